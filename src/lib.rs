//! RSA Key Bias Analysis Library
//!
//! Measures statistical bias in RSA keys harvested from many generating
//! devices (smart cards, libraries). Keys are grouped by the device that
//! produced them and every analysis produces per-device distributions
//! that are compared side by side as percentage tables.
//!
//! # Architecture
//!
//! ```text
//! source → StatsContainer → analyses → ReportSink
//!   ↓                          ↓
//! progress               exports / transform
//! ```
//!
//! - [`source`] reads the legacy TLV dumps or the flat CSV format and
//!   announces each device before its keys.
//! - [`stats`] holds the aggregation engine: per-device [`CardStats`],
//!   the cross-device percentage container and the randomness tests.
//! - [`analyzers`] holds the concrete analyses (validity, bits, bytes,
//!   prime difference, smoothness, generation time).
//! - [`output`] writes tables and reports, per-key exports and
//!   transformed CSV files.
//!
//! # Example
//!
//! ```no_run
//! use keycheck::{
//!     analyzers::PrimeBaseStats,
//!     output::MemorySink,
//!     stats::{CardStatsPercentageContainer, Stats},
//!     KeyRecord,
//! };
//! use num_bigint::BigUint;
//!
//! let mut stats = CardStatsPercentageContainer::new(PrimeBaseStats::new);
//!
//! stats.change_card("4090", Some(1));
//! stats.process(&KeyRecord::new(
//!     BigUint::from(17u32),
//!     BigUint::from(3233u32),
//!     BigUint::from(61u32),
//!     BigUint::from(53u32),
//! ));
//!
//! let mut sink = MemorySink::new();
//! stats.print(&mut sink);
//! assert!(sink.table("validity.dat").is_some());
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod analyzers;
pub mod config;
pub mod generate;
pub mod key;
pub mod metrics;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod source;
pub mod stats;

// Re-export commonly used types at crate root
pub use config::{ConfigError, FileConfig};
pub use key::{KeyError, KeyRecord, PrimeTable};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use output::{DirectorySink, MemorySink, ReportSink, Table};
pub use pipeline::{AnalysisSelection, Pipeline, PipelineError};
pub use progress::Progress;
pub use source::{RecordSource, SourceError, SourceOptions};
pub use stats::{CardStats, Stats, StatsContainer};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
