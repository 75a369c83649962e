//! Assembles the selected analyses and drives a run over input files.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::analyzers::{
    AllBitsStats, AllBytesStats, PrimeBaseStats, PrimeDifferenceStats, PrimeStrengthStats,
    SmoothnessAnalyzer, TimeStats,
};
use crate::config::FileConfig;
use crate::key::{KeyRecord, PrimeTable};
use crate::metrics::MetricsSnapshot;
use crate::output::{
    DifferenceExport, DirectorySink, ExportStats, FormatTransform, OutputError, ReportSink,
    TimeExport,
};
use crate::progress::Progress;
use crate::source::{source_for, RecordSource, SourceOptions};
use crate::stats::{
    BinningPolicy, CardStatsPercentageContainer, RandomnessStats, Stats, StatsContainer,
};

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The selection is empty.
    #[error("no analysis selected")]
    NothingSelected,
    /// The output directory or report could not be written.
    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Which analyses take part in a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisSelection {
    /// Rewrite keys as flat CSV files.
    pub transform: bool,
    /// Validity, uniqueness and private exponent length.
    pub base: bool,
    /// Bit position distributions.
    pub bits: bool,
    /// Byte value distributions.
    pub bytes: bool,
    /// Prime difference and order.
    pub difference: bool,
    /// Smoothness of p - 1 and q - 1.
    pub strength: bool,
    /// Generation time distributions.
    pub time: bool,
    /// Sequence randomness tests.
    pub randomness: bool,
}

impl AnalysisSelection {
    /// Every analysis, including the format transformation.
    pub fn all() -> Self {
        Self {
            transform: true,
            base: true,
            bits: true,
            bytes: true,
            difference: true,
            strength: true,
            time: true,
            randomness: true,
        }
    }

    /// Returns true if nothing is selected.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Builds the analyses of `selection`.
///
/// Exports and transformed files go to `output_dir`, which must exist.
pub fn build_stats(
    selection: &AnalysisSelection,
    config: &FileConfig,
    output_dir: &Path,
) -> StatsContainer {
    let analysis = &config.analysis;
    let policy = BinningPolicy::default().with_max_rows(analysis.max_rows);
    let mut stats = StatsContainer::new();

    if selection.transform {
        stats.add(FormatTransform::new(output_dir));
    }
    if selection.base {
        stats.add(CardStatsPercentageContainer::with_binning(
            PrimeBaseStats::new,
            policy,
        ));
    }
    if selection.bits {
        stats.add(CardStatsPercentageContainer::with_binning(
            AllBitsStats::new,
            policy,
        ));
    }
    if selection.bytes {
        let bytes = analysis.byte_selection();
        stats.add(CardStatsPercentageContainer::with_binning(
            move |icsn: &str, expected: Option<u64>| AllBytesStats::new(icsn, expected, bytes),
            policy,
        ));
    }
    if selection.difference {
        stats.add(CardStatsPercentageContainer::with_binning(
            PrimeDifferenceStats::new,
            policy,
        ));
        stats.add(ExportStats::create(output_dir, DifferenceExport));
    }
    if selection.strength {
        let table = std::sync::Arc::new(PrimeTable::new(analysis.smooth_bound));
        let analyzer = SmoothnessAnalyzer::new(table, analysis.prime_rounds);
        tracing::debug!(bound = analyzer.bound(), "Prime table ready");
        stats.add(CardStatsPercentageContainer::with_binning(
            move |icsn: &str, expected: Option<u64>| {
                PrimeStrengthStats::new(icsn, expected, analyzer.clone())
            },
            policy,
        ));
    }
    if selection.time {
        stats.add(ExportStats::create(output_dir, TimeExport));
        for &width in &analysis.time_binnings {
            stats.add(CardStatsPercentageContainer::with_binning(
                TimeStats::new,
                BinningPolicy::fixed(width).with_max_rows(analysis.max_rows),
            ));
        }
    }
    if selection.randomness {
        stats.add(RandomnessStats::new());
    }

    stats
}

/// Totals of the ingestion phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Keys read.
    pub keys: u64,
    /// Keys that failed validation.
    pub invalid: u64,
    /// Devices announced.
    pub cards: u64,
    /// Files read to the end.
    pub files_loaded: u64,
    /// Files aborted by an error.
    pub files_failed: u64,
}

/// Counts device announcements on their way to the analyses.
struct CardCounter<'a> {
    inner: &'a mut dyn Stats,
    cards: u64,
}

impl Stats for CardCounter<'_> {
    fn process(&mut self, key: &KeyRecord) {
        self.inner.process(key);
    }

    fn change_card(&mut self, icsn: &str, expected_keys: Option<u64>) {
        self.cards += 1;
        self.inner.change_card(icsn, expected_keys);
    }

    fn print(&mut self, sink: &mut dyn ReportSink) {
        self.inner.print(sink);
    }
}

/// A set of analyses fed from one input format.
pub struct Pipeline {
    stats: StatsContainer,
    source: Box<dyn RecordSource>,
    options: SourceOptions,
    summary: RunSummary,
}

impl Pipeline {
    /// Creates a pipeline reading CSV files when `new_format` is set, legacy files otherwise.
    pub fn new(stats: StatsContainer, new_format: bool, options: SourceOptions) -> Self {
        Self {
            stats,
            source: source_for(new_format, options.clone()),
            options,
            summary: RunSummary::default(),
        }
    }

    /// Totals so far.
    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    /// Loads every file in order.
    ///
    /// A file that fails is logged and skipped. Loading stops early once
    /// the interrupt flag is raised.
    pub fn load_files(&mut self, files: &[PathBuf], progress: &mut Progress) {
        for path in files {
            if self.options.interrupted() {
                tracing::warn!("Interrupted, skipping remaining files");
                break;
            }

            let mut counter = CardCounter {
                inner: &mut self.stats,
                cards: 0,
            };
            let result = self.source.load(path, &mut counter, progress);
            self.summary.cards += counter.cards;

            match result {
                Ok(loaded) => {
                    self.summary.files_loaded += 1;
                    self.summary.keys += loaded.keys;
                    self.summary.invalid += loaded.invalid;
                }
                Err(e) => {
                    tracing::error!(file = %path.display(), error = %e, "Cannot load file");
                    self.summary.files_failed += 1;
                }
            }
        }
    }

    /// Writes every analysis' results to `sink`.
    pub fn finish(mut self, sink: &mut dyn ReportSink) -> RunSummary {
        self.stats.print(sink);
        self.summary
    }
}

/// Runs the selected analyses over `files` and writes the results to
/// the configured output directory.
pub fn run(
    files: &[PathBuf],
    selection: &AnalysisSelection,
    config: &FileConfig,
    new_format: bool,
    options: SourceOptions,
    progress: &mut Progress,
) -> Result<MetricsSnapshot, PipelineError> {
    if selection.is_empty() {
        return Err(PipelineError::NothingSelected);
    }

    let mut sink = DirectorySink::create(&config.output.directory, &config.output.report_file)?;
    let stats = build_stats(selection, config, sink.directory());

    let mut pipeline = Pipeline::new(stats, new_format, options);
    pipeline.load_files(files, progress);
    let summary = pipeline.finish(&mut sink);
    sink.write_line(&progress.finish());
    sink.flush()?;

    if summary.files_failed > 0 {
        tracing::warn!(failed = summary.files_failed, "Some files could not be loaded");
    }

    Ok(MetricsSnapshot {
        keys_processed: summary.keys,
        keys_invalid: summary.invalid,
        cards: summary.cards,
        files_loaded: summary.files_loaded,
        files_failed: summary.files_failed,
        tables_written: sink.tables_written(),
        table_write_failures: sink.table_failures(),
    })
}
