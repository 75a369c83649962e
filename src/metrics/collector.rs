//! Metrics collection and registry.

use std::path::{Path, PathBuf};

use prometheus::{Encoder, IntCounter, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Registration or encoding failed.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
    /// The metrics file could not be written.
    #[error("cannot write metrics to {}: {source}", path.display())]
    Io {
        /// Target file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Totals of one analysis run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Keys handed to the analyses.
    pub keys_processed: u64,
    /// Keys that failed validation.
    pub keys_invalid: u64,
    /// Devices announced by the sources.
    pub cards: u64,
    /// Input files read to the end.
    pub files_loaded: u64,
    /// Input files aborted by an error.
    pub files_failed: u64,
    /// Result tables written.
    pub tables_written: u64,
    /// Result tables that could not be written.
    pub table_write_failures: u64,
}

/// Prometheus metrics registry for analysis runs.
pub struct MetricsRegistry {
    registry: Registry,

    // Input metrics
    keys_processed: IntCounter,
    keys_invalid: IntCounter,
    cards: IntCounter,
    files_loaded: IntCounter,
    files_failed: IntCounter,

    // Output metrics
    tables_written: IntCounter,
    table_write_failures: IntCounter,
}

fn advance(counter: &IntCounter, target: u64) {
    let current = counter.get();
    if target > current {
        counter.inc_by(target - current);
    }
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all run metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let keys_processed = IntCounter::new(
            "keycheck_keys_processed_total",
            "Total number of keys handed to the analyses",
        )?;
        let keys_invalid = IntCounter::new(
            "keycheck_keys_invalid_total",
            "Total number of keys that failed validation",
        )?;
        let cards = IntCounter::new("keycheck_cards_total", "Total number of devices seen")?;
        let files_loaded = IntCounter::new(
            "keycheck_files_loaded_total",
            "Total number of input files read completely",
        )?;
        let files_failed = IntCounter::new(
            "keycheck_files_failed_total",
            "Total number of input files aborted by an error",
        )?;
        let tables_written = IntCounter::new(
            "keycheck_tables_written_total",
            "Total number of result tables written",
        )?;
        let table_write_failures = IntCounter::new(
            "keycheck_table_write_failures_total",
            "Total number of result tables that could not be written",
        )?;

        registry.register(Box::new(keys_processed.clone()))?;
        registry.register(Box::new(keys_invalid.clone()))?;
        registry.register(Box::new(cards.clone()))?;
        registry.register(Box::new(files_loaded.clone()))?;
        registry.register(Box::new(files_failed.clone()))?;
        registry.register(Box::new(tables_written.clone()))?;
        registry.register(Box::new(table_write_failures.clone()))?;

        Ok(Self {
            registry,
            keys_processed,
            keys_invalid,
            cards,
            files_loaded,
            files_failed,
            tables_written,
            table_write_failures,
        })
    }

    /// Brings every counter up to the totals of `snapshot`.
    ///
    /// Counters never decrease; smaller totals are ignored.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        advance(&self.keys_processed, snapshot.keys_processed);
        advance(&self.keys_invalid, snapshot.keys_invalid);
        advance(&self.cards, snapshot.cards);
        advance(&self.files_loaded, snapshot.files_loaded);
        advance(&self.files_failed, snapshot.files_failed);
        advance(&self.tables_written, snapshot.tables_written);
        advance(&self.table_write_failures, snapshot.table_write_failures);
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Writes the text exposition to `path`.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), MetricsError> {
        let path = path.as_ref();
        std::fs::write(path, self.encode()?).map_err(|source| MetricsError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_metrics_update() {
        let registry = MetricsRegistry::new().unwrap();

        let snapshot = MetricsSnapshot {
            keys_processed: 120,
            keys_invalid: 3,
            cards: 2,
            files_loaded: 2,
            files_failed: 1,
            tables_written: 14,
            table_write_failures: 0,
        };
        registry.update(&snapshot);
        // counters do not go backwards
        registry.update(&MetricsSnapshot::default());

        let output = registry.encode().unwrap();
        assert!(output.contains("keycheck_keys_processed_total 120"));
        assert!(output.contains("keycheck_keys_invalid_total 3"));
        assert!(output.contains("keycheck_files_failed_total 1"));
        assert!(output.contains("keycheck_tables_written_total 14"));
    }

    #[test]
    fn test_metrics_encode() {
        let registry = MetricsRegistry::new().unwrap();
        let output = registry.encode().unwrap();

        assert!(output.contains("keycheck_cards_total"));
        assert!(output.contains("keycheck_files_loaded_total"));
        assert!(output.contains("keycheck_table_write_failures_total"));
    }

    #[test]
    fn test_write_to_file() {
        let path = std::env::temp_dir().join(format!("keycheck-metrics-{}.prom", std::process::id()));
        let registry = MetricsRegistry::new().unwrap();
        registry.write_to(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("# TYPE keycheck_keys_processed_total counter"));
        let _ = std::fs::remove_file(&path);
    }
}
