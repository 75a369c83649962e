//! keycheck CLI
//!
//! Runs the selected bias analyses over key files, or generates a
//! reference corpus of keys.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use keycheck::{
    generate::{self, KeyGenerator, DEFAULT_KEY_COUNT},
    pipeline::{self, AnalysisSelection},
    FileConfig, MetricsRegistry, Progress, SourceOptions,
};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "keycheck")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Statistical bias analysis of RSA keys", long_about = None)]
struct Cli {
    /// Input files are in the CSV format (id;n;e;p;q;d;t)
    #[arg(long)]
    new_format: bool,

    /// Rewrite every device's keys as <id>.transformed.csv
    #[arg(long)]
    transform: bool,

    /// Validity, uniqueness and private exponent length
    #[arg(long)]
    base: bool,

    /// Bit position distributions
    #[arg(long)]
    bits: bool,

    /// Byte value distributions
    #[arg(long)]
    bytes: bool,

    /// Prime difference and order
    #[arg(long)]
    difference: bool,

    /// Smoothness of p-1 and q-1
    #[arg(long)]
    strength: bool,

    /// Generation time distributions
    #[arg(long)]
    time: bool,

    /// Turning point and positive difference tests
    #[arg(long)]
    randomness: bool,

    /// Every analysis except the transformation
    #[arg(long)]
    all: bool,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for tables and exports (overrides the configuration)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Write Prometheus metrics of the run to this file
    #[arg(long)]
    metrics_out: Option<PathBuf>,

    /// Generate a key corpus of this modulus length (512 or 1024)
    #[arg(long, value_name = "BITS")]
    generate: Option<u64>,

    /// Number of keys to generate
    #[arg(long, default_value_t = DEFAULT_KEY_COUNT)]
    count: u64,

    /// Key files to analyse
    files: Vec<PathBuf>,
}

impl Cli {
    fn selection(&self) -> AnalysisSelection {
        if self.all {
            return AnalysisSelection {
                transform: self.transform,
                ..AnalysisSelection::all()
            };
        }
        AnalysisSelection {
            transform: self.transform,
            base: self.base,
            bits: self.bits,
            bytes: self.bytes,
            difference: self.difference,
            strength: self.strength,
            time: self.time,
            randomness: self.randomness,
        }
    }
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("keycheck v{}", keycheck::VERSION);

    let mut config = match &cli.config {
        Some(path) => match FileConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!("Invalid configuration: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => FileConfig::default(),
    };
    if let Some(dir) = &cli.output_dir {
        config.output.directory = dir.clone();
    }

    let interrupt = Arc::new(AtomicBool::new(false));
    let handler_flag = interrupt.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    }) {
        warn!("Cannot install interrupt handler: {}", e);
    }

    if let Some(bits) = cli.generate {
        return generate_keys(bits, cli.count, &config, &interrupt);
    }

    let selection = cli.selection();
    if selection.is_empty() || cli.files.is_empty() {
        let _ = Cli::command().print_help();
        return ExitCode::FAILURE;
    }

    let options = SourceOptions {
        prime_rounds: config.analysis.prime_rounds,
        interrupt,
    };
    let mut progress = Progress::stderr();
    let snapshot = match pipeline::run(
        &cli.files,
        &selection,
        &config,
        cli.new_format,
        options,
        &mut progress,
    ) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!("Analysis failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!(
        "Processed {} keys from {} files ({} invalid, {} files failed)",
        snapshot.keys_processed, snapshot.files_loaded, snapshot.keys_invalid, snapshot.files_failed
    );

    if let Some(path) = &cli.metrics_out {
        let written = MetricsRegistry::new().and_then(|registry| {
            registry.update(&snapshot);
            registry.write_to(path)
        });
        if let Err(e) = written {
            warn!("Metrics not written: {}", e);
        }
    }

    ExitCode::SUCCESS
}

fn generate_keys(bits: u64, count: u64, config: &FileConfig, interrupt: &AtomicBool) -> ExitCode {
    let mut generator = match KeyGenerator::from_os_entropy(bits) {
        Ok(generator) => generator,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let directory = &config.output.directory;
    if let Err(e) = std::fs::create_dir_all(directory) {
        error!("Cannot create {}: {}", directory.display(), e);
        return ExitCode::FAILURE;
    }
    let path = directory.join(generate::output_file_name(bits));

    let mut progress = Progress::stderr();
    match generate::generate(&mut generator, count, &path, &mut progress, interrupt) {
        Ok(written) => {
            info!("Generated {} keys into {}", written, path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Generation failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
