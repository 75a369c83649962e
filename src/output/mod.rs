//! Report sinks, per-key exports and format transformation.
//!
//! Analyzers never touch the filesystem directly when they finish; they
//! hand [`Table`]s and text lines to a [`ReportSink`]. The directory sink
//! persists them, the memory sink keeps them for inspection.

mod export;
mod sink;
mod table;
mod transform;

pub use export::{DifferenceExport, ExportStats, Exporter, TimeExport};
pub use sink::{DirectorySink, MemorySink, ReportSink};
pub use table::Table;
pub use transform::FormatTransform;

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while persisting results.
#[derive(Debug, Error)]
pub enum OutputError {
    /// A table, export or report file could not be written.
    #[error("cannot write {}: {source}", path.display())]
    Io {
        /// File being written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl OutputError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
