//! Destinations for finished statistics.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{OutputError, Table};

/// Receives comparison tables and free-form report lines.
pub trait ReportSink {
    /// Persists one table. A failure only affects this table.
    fn write_table(&mut self, table: &Table) -> Result<(), OutputError>;

    /// Appends one line of the textual report.
    fn write_line(&mut self, line: &str);
}

/// Keeps everything in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    tables: Vec<Table>,
    lines: Vec<String>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All tables in the order they were written.
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// Finds a table by name.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name() == name)
    }

    /// All report lines.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl ReportSink for MemorySink {
    fn write_table(&mut self, table: &Table) -> Result<(), OutputError> {
        self.tables.push(table.clone());
        Ok(())
    }

    fn write_line(&mut self, line: &str) {
        self.lines.push(line.to_owned());
    }
}

/// Writes each table to `<directory>/<name>` and the report lines to a
/// single text file in the same directory.
pub struct DirectorySink {
    directory: PathBuf,
    report_path: PathBuf,
    report: BufWriter<File>,
    tables_written: u64,
    table_failures: u64,
}

impl DirectorySink {
    /// Creates the directory if needed and opens the report file.
    pub fn create(directory: impl AsRef<Path>, report_file: &str) -> Result<Self, OutputError> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory).map_err(|e| OutputError::io(&directory, e))?;

        let report_path = directory.join(report_file);
        let file = File::create(&report_path).map_err(|e| OutputError::io(&report_path, e))?;
        let mut report = BufWriter::new(file);
        writeln!(
            report,
            "# keycheck {} report, generated {}",
            crate::VERSION,
            chrono::Local::now().to_rfc3339()
        )
        .map_err(|e| OutputError::io(&report_path, e))?;

        tracing::info!(directory = %directory.display(), "Writing statistics");

        Ok(Self {
            directory,
            report_path,
            report,
            tables_written: 0,
            table_failures: 0,
        })
    }

    /// Output directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Number of tables successfully written.
    pub fn tables_written(&self) -> u64 {
        self.tables_written
    }

    /// Number of tables that could not be written.
    pub fn table_failures(&self) -> u64 {
        self.table_failures
    }

    /// Flushes the report file.
    pub fn flush(&mut self) -> Result<(), OutputError> {
        self.report
            .flush()
            .map_err(|e| OutputError::io(&self.report_path, e))
    }

    fn write_table_file(&self, table: &Table) -> Result<(), OutputError> {
        let path = self.directory.join(table.name());
        fs::write(&path, table.to_tsv()).map_err(|e| OutputError::io(&path, e))
    }
}

impl ReportSink for DirectorySink {
    fn write_table(&mut self, table: &Table) -> Result<(), OutputError> {
        match self.write_table_file(table) {
            Ok(()) => {
                self.tables_written += 1;
                tracing::debug!(table = table.name(), rows = table.rows().len(), "Table written");
                Ok(())
            }
            Err(e) => {
                self.table_failures += 1;
                Err(e)
            }
        }
    }

    fn write_line(&mut self, line: &str) {
        if let Err(e) = writeln!(self.report, "{}", line) {
            tracing::warn!(error = %e, path = %self.report_path.display(), "Cannot write report line");
        }
    }
}

impl Drop for DirectorySink {
    fn drop(&mut self) {
        let _ = self.report.flush();
    }
}
