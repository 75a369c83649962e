//! Key record sources.
//!
//! A source reads one input file, announces each device with
//! [`Stats::change_card`] before its first key and feeds every parsed key
//! to [`Stats::process`]. Two formats are supported:
//!
//! - [`LegacySource`]: colon-delimited lines with TLV-encoded public and
//!   private keys, one device per `CPLC.ICSerialNumber` line.
//! - [`CsvSource`]: flat `id;n;e;p;q;d;time` lines, one device per file.

mod csv;
mod legacy;

pub use self::csv::CsvSource;
pub use legacy::{parse_tlv, LegacySource};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::key::{KeyRecord, DEFAULT_PRIME_ROUNDS};
use crate::progress::Progress;
use crate::stats::Stats;

/// Errors raised while loading an input file.
///
/// Either error aborts the current file only.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The file could not be opened or read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// Input file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A line does not follow the input format.
    #[error("{} is in wrong format (line {line}): {message}", path.display())]
    Malformed {
        /// Input file.
        path: PathBuf,
        /// 1-based line number.
        line: u64,
        /// What was wrong with the line.
        message: String,
    },
}

impl SourceError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn malformed(path: &Path, line: u64, message: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.to_path_buf(),
            line,
            message: message.into(),
        }
    }
}

/// Keys delivered from one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Keys handed to the analyses.
    pub keys: u64,
    /// How many of those failed validation.
    pub invalid: u64,
}

impl LoadSummary {
    fn record(&mut self, key: &KeyRecord) {
        self.keys += 1;
        if !key.is_valid() {
            self.invalid += 1;
        }
    }
}

/// Settings shared by every source.
#[derive(Debug, Clone)]
pub struct SourceOptions {
    /// Miller-Rabin rounds used to validate loaded keys.
    pub prime_rounds: u32,
    /// Set asynchronously to stop ingesting at the next line.
    pub interrupt: Arc<AtomicBool>,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            prime_rounds: DEFAULT_PRIME_ROUNDS,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl SourceOptions {
    pub(crate) fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }
}

/// Reads keys from a file into an analysis.
pub trait RecordSource {
    /// Loads every key of `path`.
    ///
    /// Keys processed before an error are kept by the analyses.
    fn load(
        &self,
        path: &Path,
        stats: &mut dyn Stats,
        progress: &mut Progress,
    ) -> Result<LoadSummary, SourceError>;
}

/// Returns the source for the selected input format.
pub fn source_for(new_format: bool, options: SourceOptions) -> Box<dyn RecordSource> {
    if new_format {
        Box::new(CsvSource::new(options))
    } else {
        Box::new(LegacySource::new(options))
    }
}
