//! Prometheus metrics for analysis runs.
//!
//! The totals of a run are collected into a [`MetricsSnapshot`], applied
//! to a [`MetricsRegistry`] and written in text exposition format.
//!
//! # Metrics Exposed
//!
//! ## Input Metrics
//! - `keycheck_keys_processed_total` - Keys handed to the analyses
//! - `keycheck_keys_invalid_total` - Keys that failed validation
//! - `keycheck_cards_total` - Devices announced by the sources
//! - `keycheck_files_loaded_total` - Input files read completely
//! - `keycheck_files_failed_total` - Input files aborted by an error
//!
//! ## Output Metrics
//! - `keycheck_tables_written_total` - Result tables written
//! - `keycheck_table_write_failures_total` - Result tables that failed
//!
//! # Example
//!
//! ```no_run
//! use keycheck::metrics::{MetricsRegistry, MetricsSnapshot};
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//!
//! let snapshot = MetricsSnapshot {
//!     keys_processed: 50_000,
//!     files_loaded: 1,
//!     cards: 1,
//!     ..Default::default()
//! };
//!
//! registry.update(&snapshot);
//! registry.write_to("keycheck.prom").expect("Failed to write metrics");
//! ```

mod collector;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
