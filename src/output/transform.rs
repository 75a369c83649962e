//! Rewrites keys of any source format into the flat CSV format.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::key::KeyRecord;
use crate::output::ReportSink;
use crate::stats::{Stats, UNNAMED_CARD};

/// Writes the keys of every device to `<directory>/<id>.transformed.csv`.
pub struct FormatTransform {
    directory: PathBuf,
    current: Option<(PathBuf, BufWriter<File>)>,
    key_number: u64,
    files_written: u64,
    announced: bool,
}

impl FormatTransform {
    /// Creates a transform writing into `directory`.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            current: None,
            key_number: 0,
            files_written: 0,
            announced: false,
        }
    }

    /// Number of device files opened so far.
    pub fn files_written(&self) -> u64 {
        self.files_written
    }

    fn close(&mut self) {
        if let Some((path, mut writer)) = self.current.take() {
            if let Err(e) = writer.flush() {
                tracing::warn!(path = %path.display(), error = %e, "Cannot close transform output");
            }
        }
    }
}

impl Stats for FormatTransform {
    fn change_card(&mut self, icsn: &str, _expected_keys: Option<u64>) {
        self.close();
        self.key_number = 0;
        self.announced = true;

        let path = self.directory.join(format!("{}.transformed.csv", icsn));
        match File::create(&path) {
            Ok(file) => {
                tracing::debug!(path = %path.display(), "Transforming keys");
                self.current = Some((path, BufWriter::new(file)));
                self.files_written += 1;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot open file for transform output");
            }
        }
    }

    fn process(&mut self, key: &KeyRecord) {
        if !self.announced {
            self.change_card(UNNAMED_CARD, None);
        }
        let Some((path, writer)) = self.current.as_mut() else {
            tracing::warn!("No transform output open, key dropped");
            return;
        };

        self.key_number += 1;
        let line = match key.to_csv_line(self.key_number) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(key = self.key_number, error = %e, "Key cannot be transformed");
                return;
            }
        };
        if let Err(e) = writeln!(writer, "{}", line) {
            tracing::warn!(path = %path.display(), error = %e, "Error on transform output");
        }
    }

    fn print(&mut self, _sink: &mut dyn ReportSink) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::MemorySink;
    use num_bigint::BigUint;
    use std::fs;

    fn key(time: i64) -> KeyRecord {
        KeyRecord::new(
            BigUint::from(65537u32),
            BigUint::from(3233u32),
            BigUint::from(61u32),
            BigUint::from(53u32),
        )
        .with_time(time)
    }

    #[test]
    fn test_numbers_restart_per_device() {
        let dir = std::env::temp_dir().join(format!("keycheck-transform-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();

        let mut transform = FormatTransform::new(&dir);
        transform.change_card("A", None);
        transform.process(&key(1));
        transform.process(&key(2));
        transform.change_card("B", None);
        transform.process(&key(3));
        transform.print(&mut MemorySink::new());

        let a = fs::read_to_string(dir.join("A.transformed.csv")).unwrap();
        let b = fs::read_to_string(dir.join("B.transformed.csv")).unwrap();
        let a_numbers: Vec<&str> = a.lines().map(|l| l.split(';').next().unwrap()).collect();
        assert_eq!(a_numbers, vec!["1", "2"]);
        assert!(b.starts_with("1;CA1;10001;3D;35;"));
        assert!(b.trim_end().ends_with(";3"));
        assert_eq!(transform.files_written(), 2);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_failed_open_drops_device_keys() {
        // a regular file in place of the output directory
        let blocker = std::env::temp_dir().join(format!("keycheck-transform-file-{}", std::process::id()));
        fs::write(&blocker, "").unwrap();

        let mut transform = FormatTransform::new(&blocker);
        transform.change_card("A", None);
        transform.process(&key(1));
        transform.process(&key(2));
        transform.print(&mut MemorySink::new());

        assert_eq!(transform.files_written(), 0);
        assert!(!blocker.join(format!("{}.transformed.csv", UNNAMED_CARD)).exists());
        assert!(blocker.is_file());

        let _ = fs::remove_file(&blocker);
    }

    #[test]
    fn test_keys_before_announcement_go_to_unnamed_device() {
        let dir = std::env::temp_dir().join(format!("keycheck-transform-unnamed-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();

        let mut transform = FormatTransform::new(&dir);
        transform.process(&key(1));
        transform.print(&mut MemorySink::new());

        let unnamed = fs::read_to_string(dir.join(format!("{}.transformed.csv", UNNAMED_CARD))).unwrap();
        assert_eq!(unnamed.lines().count(), 1);
        assert_eq!(transform.files_written(), 1);

        let _ = fs::remove_dir_all(&dir);
    }
}
