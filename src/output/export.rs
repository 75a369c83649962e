//! Raw per-key exports.
//!
//! Each export file holds one line per device: the device id followed by
//! `;<value>` for every key of that device.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use num_bigint::BigUint;
use num_traits::{One, ToPrimitive};

use crate::key::KeyRecord;
use crate::output::ReportSink;
use crate::stats::{Stats, UNNAMED_CARD};

/// Turns a key into one value per export file.
pub trait Exporter {
    /// Output file names, one per exported value.
    fn file_names(&self) -> &'static [&'static str];

    /// Values for `key`, in the order of [`Exporter::file_names`].
    fn transform(&mut self, key: &KeyRecord) -> Vec<String>;
}

struct ExportFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

/// Writes the values of an [`Exporter`] to its files in an output
/// directory.
pub struct ExportStats<E> {
    exporter: E,
    files: Vec<Option<ExportFile>>,
    anything_written: bool,
}

impl<E: Exporter> ExportStats<E> {
    /// Opens every export file under `directory`.
    ///
    /// A file that cannot be opened is logged and skipped; the others
    /// are still written.
    pub fn create(directory: impl AsRef<Path>, exporter: E) -> Self {
        let files = exporter
            .file_names()
            .iter()
            .map(|name| {
                let path = directory.as_ref().join(name);
                match File::create(&path) {
                    Ok(file) => Some(ExportFile {
                        path,
                        writer: BufWriter::new(file),
                    }),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Cannot open file for export output");
                        None
                    }
                }
            })
            .collect();

        Self {
            exporter,
            files,
            anything_written: false,
        }
    }

    fn write_all(&mut self, values: &[String], separator: &str) {
        for (file, value) in self.files.iter_mut().zip(values) {
            let Some(file) = file else { continue };
            if let Err(e) = write!(file.writer, "{}{}", separator, value) {
                tracing::warn!(path = %file.path.display(), error = %e, "Error on export");
            }
        }
    }
}

impl<E: Exporter> Stats for ExportStats<E> {
    fn change_card(&mut self, icsn: &str, _expected_keys: Option<u64>) {
        let separator = if self.anything_written { "\n" } else { "" };
        self.anything_written = true;
        let ids = vec![icsn.to_owned(); self.files.len()];
        self.write_all(&ids, separator);
    }

    fn process(&mut self, key: &KeyRecord) {
        if !self.anything_written {
            self.change_card(UNNAMED_CARD, None);
        }
        let values = self.exporter.transform(key);
        self.write_all(&values, ";");
    }

    fn print(&mut self, _sink: &mut dyn ReportSink) {
        for file in self.files.iter_mut().filter_map(Option::take) {
            let ExportFile { path, mut writer } = file;
            if let Err(e) = writer.flush() {
                tracing::warn!(path = %path.display(), error = %e, "Cannot close export file");
            }
        }
    }
}

/// Exports |p - q| as a percentage of 2^bits and its bit length.
#[derive(Debug, Default, Clone, Copy)]
pub struct DifferenceExport;

/// `ceil(value * 100 / 2^bits)` with two decimals.
fn percent_of_power(value: &BigUint, bits: u64) -> String {
    let scale = BigUint::one() << bits;
    let hundredths: BigUint = (value * 10_000u32 + &scale - 1u32) >> bits;
    let whole = &hundredths / 100u32;
    let fraction = (&hundredths % 100u32).to_u32().unwrap_or(0);
    format!("{}.{:02}", whole, fraction)
}

impl Exporter for DifferenceExport {
    fn file_names(&self) -> &'static [&'static str] {
        &["p_minus_q.export.dat", "prime_difference_bitlength.export.dat"]
    }

    fn transform(&mut self, key: &KeyRecord) -> Vec<String> {
        let difference = key.prime_difference();
        let bits = key.p().bits().max(key.q().bits());
        vec![
            percent_of_power(&difference, bits),
            difference.bits().to_string(),
        ]
    }
}

/// Exports the generation time in milliseconds.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimeExport;

impl Exporter for TimeExport {
    fn file_names(&self) -> &'static [&'static str] {
        &["time.export.dat"]
    }

    fn transform(&mut self, key: &KeyRecord) -> Vec<String> {
        vec![key.time().unwrap_or(0).to_string()]
    }
}
