//! Flat CSV format, one device per file.
//!
//! ```text
//! id;n;e;p;q;d;t
//! 1;CA1;11;3D;35;AC1;42
//! ```
//!
//! `,` is accepted as a separator. Numbers are hexadecimal, the time is
//! a decimal number of milliseconds. Lines whose first field is not a
//! number (such as the header) are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use num_bigint::BigUint;

use super::{LoadSummary, RecordSource, SourceError, SourceOptions};
use crate::key::KeyRecord;
use crate::progress::Progress;
use crate::stats::Stats;

const FIELDS: usize = 7;

/// Splits a line into at most seven fields, or `None` if it is not a
/// data line.
fn data_fields(line: &str) -> Option<Vec<String>> {
    let line = line.replace(',', ";");
    let fields: Vec<String> = line.splitn(FIELDS, ';').map(str::to_owned).collect();
    let id = fields.first()?.trim();
    (!id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())).then_some(fields)
}

fn hex(field: &str) -> Option<BigUint> {
    BigUint::parse_bytes(field.trim().as_bytes(), 16)
}

fn parse_key(fields: &[String]) -> Option<KeyRecord> {
    let modulus = hex(&fields[1])?;
    let exponent = hex(&fields[2])?;
    let p = hex(&fields[3])?;
    let q = hex(&fields[4])?;
    let time: i64 = fields[6].trim().parse().ok()?;
    Some(KeyRecord::new(exponent, modulus, p, q).with_time(time))
}

/// Reader for the CSV format.
#[derive(Debug, Clone, Default)]
pub struct CsvSource {
    options: SourceOptions,
}

impl CsvSource {
    /// Creates a CSV reader.
    pub fn new(options: SourceOptions) -> Self {
        Self { options }
    }

    fn count_keys(&self, path: &Path) -> Result<u64, SourceError> {
        let file = File::open(path).map_err(|e| SourceError::io(path, e))?;
        let mut count = 0;
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| SourceError::io(path, e))?;
            if data_fields(&line).is_some_and(|fields| fields.len() == FIELDS) {
                count += 1;
            }
        }
        Ok(count)
    }
}

impl RecordSource for CsvSource {
    fn load(
        &self,
        path: &Path,
        stats: &mut dyn Stats,
        progress: &mut Progress,
    ) -> Result<LoadSummary, SourceError> {
        let expected = self.count_keys(path)?;
        progress.start_file(path, expected);

        let file = File::open(path).map_err(|e| SourceError::io(path, e))?;
        let icsn = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        stats.change_card(&icsn, Some(expected));

        let mut summary = LoadSummary::default();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            if self.options.interrupted() {
                tracing::warn!(path = %path.display(), "Interrupted, stopping input");
                break;
            }
            let line_number = index as u64 + 1;
            let line = line.map_err(|e| SourceError::io(path, e))?;

            let Some(fields) = data_fields(&line) else {
                continue;
            };
            if fields.len() < FIELDS {
                return Err(SourceError::malformed(
                    path,
                    line_number,
                    format!("expected {} fields, found {}", FIELDS, fields.len()),
                ));
            }

            match parse_key(&fields) {
                Some(key) => {
                    let key = key.with_prime_rounds(self.options.prime_rounds);
                    stats.process(&key);
                    summary.record(&key);
                    progress.key_done();
                }
                None => {
                    tracing::warn!(
                        path = %path.display(),
                        line = line_number,
                        key = summary.keys,
                        "Key is not correct, skipping: {}",
                        line
                    );
                }
            }
        }

        progress.finish_file();
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::test_support::{scratch_file, Event, Recorder};

    #[test]
    fn test_data_fields() {
        assert!(data_fields("id;n;e;p;q;d;t").is_none());
        assert!(data_fields("").is_none());
        assert_eq!(data_fields("1,a,b,c,d,e,f").unwrap().len(), 7);
        assert_eq!(data_fields("1;a;b;c;d;e;f;g").unwrap()[6], "f;g");
    }

    #[test]
    fn test_load_records() {
        let content = "id;n;e;p;q;d;t\n1;CA1;11;3D;35;AC1;42\n2,ca1,11,3d,35,ac1,7\n";
        let path = scratch_file("device-7.csv", content);

        let recorder = Recorder::default();
        let mut stats = recorder.clone();
        let summary = CsvSource::default()
            .load(&path, &mut stats, &mut Progress::hidden())
            .unwrap();

        assert_eq!(summary, LoadSummary { keys: 2, invalid: 0 });
        let events = recorder.events.borrow();
        assert_eq!(events[0], Event::Card("device-7".into(), Some(2)));
        assert_eq!(events[1], Event::Key { p: "61".into(), time: Some(42) });
        assert_eq!(events[2], Event::Key { p: "61".into(), time: Some(7) });
    }

    #[test]
    fn test_bad_number_skips_key() {
        let content = "1;CA1;11;3D;35;AC1;42\n2;XYZ;11;3D;35;AC1;42\n3;CA1;11;3D;35;AC1;x\n4;CA1;11;3D;35;AC1;1\n";
        let path = scratch_file("skip.csv", content);

        let summary = CsvSource::default()
            .load(&path, &mut Recorder::default(), &mut Progress::hidden())
            .unwrap();
        assert_eq!(summary.keys, 2);
    }

    #[test]
    fn test_short_line_aborts_file() {
        let content = "1;CA1;11;3D;35;AC1;42\n2;CA1;11\n3;CA1;11;3D;35;AC1;42\n";
        let path = scratch_file("short.csv", content);

        let recorder = Recorder::default();
        let mut stats = recorder.clone();
        let err = CsvSource::default()
            .load(&path, &mut stats, &mut Progress::hidden())
            .unwrap_err();

        assert!(matches!(err, SourceError::Malformed { line: 2, .. }));
        assert_eq!(recorder.events.borrow().len(), 2);
    }

    #[test]
    fn test_invalid_keys_are_counted() {
        let path = scratch_file("invalid.csv", "1;CA2;11;3D;35;0;0\n");
        let summary = CsvSource::default()
            .load(&path, &mut Recorder::default(), &mut Progress::hidden())
            .unwrap();
        assert_eq!(summary, LoadSummary { keys: 1, invalid: 1 });
    }
}
