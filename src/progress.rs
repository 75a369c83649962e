//! Console progress reporting.
//!
//! Status lines are rewritten in place on the console (stderr by
//! default) at most every [`STATUS_INTERVAL`]; lifecycle events also go
//! through `tracing`.

use std::io::{self, Write};
use std::path::Path;
use std::time::{Duration, Instant};

/// Minimum delay between two status lines.
pub const STATUS_INTERVAL: Duration = Duration::from_millis(500);

/// File names longer than this are shortened on the console.
const MAX_NAME_WIDTH: usize = 60;

/// Tracks keys processed per file and over the whole run.
pub struct Progress {
    console: Box<dyn Write>,
    run_start: Instant,
    file_start: Instant,
    last_status: Option<Instant>,
    file_keys: u64,
    file_expected: u64,
    total_keys: u64,
    status_width: usize,
}

impl Progress {
    /// Reports to `console`.
    pub fn new(console: Box<dyn Write>) -> Self {
        let now = Instant::now();
        Self {
            console,
            run_start: now,
            file_start: now,
            last_status: None,
            file_keys: 0,
            file_expected: 0,
            total_keys: 0,
            status_width: 0,
        }
    }

    /// Reports to stderr.
    pub fn stderr() -> Self {
        Self::new(Box::new(io::stderr()))
    }

    /// Discards console output; log events are still emitted.
    pub fn hidden() -> Self {
        Self::new(Box::new(io::sink()))
    }

    /// Keys processed since the run started.
    pub fn total_keys(&self) -> u64 {
        self.total_keys
    }

    /// Time since the run started.
    pub fn elapsed(&self) -> Duration {
        self.run_start.elapsed()
    }

    /// Starts a new file of `expected` keys.
    pub fn start_file(&mut self, path: &Path, expected: u64) {
        let name = path.display().to_string();
        tracing::info!(file = %name, keys = expected, "Analysing file");
        self.print_line(&format!("Analysing file: {}", shorten(&name)));

        self.file_start = Instant::now();
        self.last_status = Some(self.file_start);
        self.file_keys = 0;
        self.file_expected = expected;
    }

    /// Counts one processed key.
    pub fn key_done(&mut self) {
        self.file_keys += 1;
        self.total_keys += 1;

        let due = self
            .last_status
            .map_or(true, |last| last.elapsed() >= STATUS_INTERVAL);
        if due || self.file_keys == self.file_expected {
            let line = status_line(self.file_keys, self.file_expected, self.file_start.elapsed());
            self.replace_line(&line);
            self.last_status = Some(Instant::now());
        }
    }

    /// Ends the current file's status line.
    pub fn finish_file(&mut self) {
        if self.status_width > 0 {
            let _ = writeln!(self.console);
            self.status_width = 0;
        }
        tracing::debug!(keys = self.file_keys, "File done");
    }

    /// Prints and logs the completion line of the run.
    pub fn finish(&mut self) -> String {
        let line = format!(
            "Analysis completed - {} keys processed in {} ms",
            self.total_keys,
            self.elapsed().as_millis()
        );
        tracing::info!("{}", line);
        self.print_line(&line);
        line
    }

    fn replace_line(&mut self, line: &str) {
        let padding = self.status_width.saturating_sub(line.len());
        let _ = write!(self.console, "\r{}{}", line, " ".repeat(padding));
        let _ = self.console.flush();
        self.status_width = line.len();
    }

    fn print_line(&mut self, line: &str) {
        if self.status_width > 0 {
            let _ = writeln!(self.console);
            self.status_width = 0;
        }
        let _ = writeln!(self.console, "{}", line);
    }
}

/// `Processed keys: a / b | Avg. speed: x keys/s`.
pub fn status_line(done: u64, expected: u64, elapsed: Duration) -> String {
    let seconds = elapsed.as_secs_f64();
    let speed = if seconds > 0.0 { done as f64 / seconds } else { 0.0 };
    format!(
        "Processed keys: {} / {} | Avg. speed: {:.2} keys/s",
        done, expected, speed
    )
}

fn shorten(name: &str) -> String {
    if name.chars().count() > MAX_NAME_WIDTH {
        let head: String = name.chars().take(MAX_NAME_WIDTH).collect();
        format!("{}...", head)
    } else {
        name.to_owned()
    }
}
