//! Run configuration.
//!
//! Every setting has a default, so a configuration file only needs the
//! values it changes:
//!
//! ```toml
//! [analysis]
//! smooth_bound = 100000
//! time_binnings = [10, 37, 79]
//!
//! [output]
//! directory = "results"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::analyzers::{ByteSelection, DEFAULT_SMOOTH_BOUND};
use crate::key::DEFAULT_PRIME_ROUNDS;
use crate::stats::frequency::DEFAULT_MAX_ROWS;

/// Analysis parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Trial-division bound B for the smoothness analysis.
    pub smooth_bound: u32,
    /// Miller-Rabin rounds for key validation.
    pub prime_rounds: u32,
    /// Row limit before percentage tables are auto-binned.
    pub max_rows: i64,
    /// Leading byte positions analysed by the byte analysis.
    pub bytes_from_start: usize,
    /// Trailing byte positions analysed by the byte analysis.
    pub bytes_from_end: usize,
    /// Analyse every byte position instead of the leading and trailing ones.
    pub all_bytes: bool,
    /// Fixed bucket widths of the generation time tables.
    pub time_binnings: Vec<i64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            smooth_bound: DEFAULT_SMOOTH_BOUND,
            prime_rounds: DEFAULT_PRIME_ROUNDS,
            max_rows: DEFAULT_MAX_ROWS,
            bytes_from_start: 1,
            bytes_from_end: 1,
            all_bytes: false,
            time_binnings: vec![10, 37, 79],
        }
    }
}

impl AnalysisConfig {
    /// Validates the analysis parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.smooth_bound < 3 {
            return Err(ConfigError::InvalidSmoothBound(self.smooth_bound));
        }
        if self.prime_rounds == 0 {
            return Err(ConfigError::InvalidPrimeRounds);
        }
        if self.max_rows < 1 {
            return Err(ConfigError::InvalidMaxRows(self.max_rows));
        }
        if let Some(&width) = self.time_binnings.iter().find(|&&w| w <= 0) {
            return Err(ConfigError::InvalidBinning(width));
        }
        Ok(())
    }

    /// Byte positions analysed by the byte analysis.
    pub fn byte_selection(&self) -> ByteSelection {
        if self.all_bytes {
            ByteSelection::All
        } else {
            ByteSelection::Ends {
                from_start: self.bytes_from_start,
                from_end: self.bytes_from_end,
            }
        }
    }
}

/// Where results are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for tables, exports and the report.
    pub directory: PathBuf,
    /// Name of the text report inside `directory`.
    pub report_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            report_file: "stats.txt".to_owned(),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Smoothness bound below 3.
    #[error("smooth bound {0} is too small (must be at least 3)")]
    InvalidSmoothBound(u32),
    /// Zero Miller-Rabin rounds.
    #[error("prime rounds must be at least 1")]
    InvalidPrimeRounds,
    /// Row limit below 1.
    #[error("invalid row limit {0} (must be at least 1)")]
    InvalidMaxRows(i64),
    /// Non-positive time binning width.
    #[error("invalid binning width {0} (must be positive)")]
    InvalidBinning(i64),
    /// Empty report file name.
    #[error("report file name must not be empty")]
    EmptyReportFile,
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    /// The file is not valid TOML for this format.
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Analysis parameters.
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// Output locations.
    #[serde(default)]
    pub output: OutputConfig,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.analysis.validate()?;
        if self.output.report_file.trim().is_empty() {
            return Err(ConfigError::EmptyReportFile);
        }
        Ok(())
    }
}
