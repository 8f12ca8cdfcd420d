//! Row sources: static CSV exports, rolling windows, in-memory buffers
//!
//! The live broker/database feed is an external collaborator; this crate only
//! needs something that can hand back ordered rows for a lookback window.

use super::row::FeatureRow;
use crate::{Error, Result};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use std::path::{Path, PathBuf};

/// How far back a fetch should reach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookback {
    /// Every available row
    All,
    /// Rows newer than `anchor - days`
    Days(i64),
}

impl Lookback {
    /// Keep rows inside the window ending at `anchor`, in time order
    pub fn apply(&self, rows: &[FeatureRow], anchor: DateTime<Utc>) -> Vec<FeatureRow> {
        let mut out: Vec<FeatureRow> = match self {
            Lookback::All => rows.to_vec(),
            Lookback::Days(days) => {
                let start = anchor - Duration::days(*days);
                rows.iter()
                    .filter(|r| r.timestamp >= start && r.timestamp <= anchor)
                    .cloned()
                    .collect()
            }
        };
        out.sort_by_key(|r| r.timestamp);
        out
    }
}

/// Source of ordered feature rows
pub trait DataSource: Send + Sync {
    fn fetch(&self, lookback: Lookback) -> Result<Vec<FeatureRow>>;

    fn name(&self) -> &str;
}

/// Rows held in memory, windowed relative to a fixed or newest timestamp
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    rows: Vec<FeatureRow>,
    anchor: Option<DateTime<Utc>>,
}

impl MemorySource {
    pub fn new(rows: Vec<FeatureRow>) -> Self {
        Self { rows, anchor: None }
    }

    /// Treat `anchor` as "now" when applying lookbacks
    pub fn anchored_at(mut self, anchor: DateTime<Utc>) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn push(&mut self, row: FeatureRow) {
        self.rows.push(row);
    }
}

impl DataSource for MemorySource {
    fn fetch(&self, lookback: Lookback) -> Result<Vec<FeatureRow>> {
        let anchor = match self.anchor.or_else(|| self.rows.iter().map(|r| r.timestamp).max()) {
            Some(a) => a,
            None => return Ok(Vec::new()),
        };
        Ok(lookback.apply(&self.rows, anchor))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Column names accepted as the row timestamp
const TIMESTAMP_COLUMNS: [&str; 3] = ["timestamp", "received_at", "tanggal"];

/// CSV export with a timestamp column and numeric feature columns
///
/// Static by default (lookback ignored). With [`CsvSource::rolling`] the
/// lookback is applied relative to the newest row, standing in for a
/// time-windowed database query.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    rolling: bool,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rolling: false,
        }
    }

    pub fn rolling(mut self, rolling: bool) -> Self {
        self.rolling = rolling;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse every row of the file
    ///
    /// Unparsable numeric cells become missing. A row whose timestamp cannot
    /// be parsed fails the whole read with [`Error::Preprocessing`].
    pub fn read_all(&self) -> Result<Vec<FeatureRow>> {
        let mut reader = csv::Reader::from_path(&self.path)
            .map_err(|e| Error::Preprocessing(format!("{}: {e}", self.path.display())))?;
        let headers = reader
            .headers()
            .map_err(|e| Error::Preprocessing(format!("{}: {e}", self.path.display())))?
            .clone();
        let ts_idx = headers
            .iter()
            .position(|h| TIMESTAMP_COLUMNS.contains(&h.trim()))
            .ok_or_else(|| {
                Error::Preprocessing(format!(
                    "{}: no timestamp column (expected one of {TIMESTAMP_COLUMNS:?})",
                    self.path.display()
                ))
            })?;

        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            // 1-based file line; the header is line 1
            let line = index + 2;
            let record = record
                .map_err(|e| Error::Preprocessing(format!("{} line {line}: {e}", self.path.display())))?;
            let cell = record.get(ts_idx).unwrap_or_default();
            let timestamp = parse_timestamp(cell).ok_or_else(|| {
                Error::Preprocessing(format!(
                    "{} line {line}: unparsable timestamp {:?}",
                    self.path.display(),
                    cell.trim()
                ))
            })?;
            let mut row = FeatureRow::new(timestamp);
            for (idx, header) in headers.iter().enumerate() {
                if idx == ts_idx {
                    continue;
                }
                // Non-numeric cells are left missing for the fill policy
                let value = record.get(idx).and_then(|c| c.trim().parse::<f64>().ok());
                if let Some(v) = value {
                    row.set(header.trim(), v);
                }
            }
            rows.push(row);
        }
        rows.sort_by_key(|r| r.timestamp);
        Ok(rows)
    }
}

impl DataSource for CsvSource {
    fn fetch(&self, lookback: Lookback) -> Result<Vec<FeatureRow>> {
        let rows = self.read_all()?;
        if !self.rolling {
            return Ok(rows);
        }
        match rows.last().map(|r| r.timestamp) {
            Some(anchor) => Ok(lookback.apply(&rows, anchor)),
            None => Ok(rows),
        }
    }

    fn name(&self) -> &str {
        "csv"
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

/// Write rows as CSV with a `timestamp` column followed by `fields`
pub fn write_csv(rows: &[FeatureRow], fields: &[String], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| Error::Serialization(format!("{}: {e}", path.display())))?;
    let mut header = vec!["timestamp".to_string()];
    header.extend(fields.iter().cloned());
    writer
        .write_record(&header)
        .map_err(|e| Error::Serialization(e.to_string()))?;
    for row in rows {
        let mut record = vec![row.timestamp.to_rfc3339()];
        record.extend(
            fields
                .iter()
                .map(|f| row.values.get(f).map(|v| v.to_string()).unwrap_or_default()),
        );
        writer
            .write_record(&record)
            .map_err(|e| Error::Serialization(e.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::SyntheticGenerator;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_memory_source_lookback() {
        let rows = SyntheticGenerator::new(1).every(Duration::hours(1)).generate(24 * 10);
        let source = MemorySource::new(rows);
        let day = source.fetch(Lookback::Days(1)).unwrap();
        let week = source.fetch(Lookback::Days(7)).unwrap();
        assert_eq!(day.len(), 25);
        assert_eq!(week.len(), 24 * 7 + 1);
        assert_eq!(source.fetch(Lookback::All).unwrap().len(), 240);
    }

    #[test]
    fn test_empty_memory_source() {
        let source = MemorySource::default();
        assert!(source.fetch(Lookback::Days(1)).unwrap().is_empty());
    }

    #[test]
    fn test_csv_bad_timestamp_names_line() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,co2_ppm").unwrap();
        writeln!(file, "2024-01-01 00:00:00,410.5").unwrap();
        writeln!(file, "yesterday,411").unwrap();
        writeln!(file, "2024-01-01 00:10:00,412").unwrap();
        file.flush().unwrap();

        let err = CsvSource::new(file.path()).read_all().unwrap_err();
        match err {
            Error::Preprocessing(msg) => {
                assert!(msg.contains("line 3"), "{msg}");
                assert!(msg.contains("yesterday"), "{msg}");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(CsvSource::new(file.path()).rolling(true).fetch(Lookback::Days(1)).is_err());
    }

    #[test]
    fn test_csv_roundtrip_and_missing_cells() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,co2_ppm,humidity").unwrap();
        writeln!(file, "2024-01-01 00:00:00,410.5,40").unwrap();
        writeln!(file, "2024-01-01 00:05:00,n/a,41").unwrap();
        writeln!(file, "2024-01-01T00:10:00Z,412,").unwrap();
        file.flush().unwrap();

        let rows = CsvSource::new(file.path()).fetch(Lookback::All).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("co2_ppm"), Some(410.5));
        assert_eq!(rows[1].get("co2_ppm"), None);
        assert_eq!(rows[2].get("humidity"), None);
    }

    #[test]
    fn test_csv_without_timestamp_is_preprocessing_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "a,b").unwrap();
        writeln!(file, "1,2").unwrap();
        file.flush().unwrap();
        let err = CsvSource::new(file.path()).fetch(Lookback::All).unwrap_err();
        assert!(matches!(err, Error::Preprocessing(_)));
    }

    #[test]
    fn test_write_then_read_rolling() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        let rows = SyntheticGenerator::new(5).every(Duration::hours(6)).generate(40);
        let fields = vec!["co2_ppm".to_string(), "aqi".to_string()];
        write_csv(&rows, &fields, &path).unwrap();

        let all = CsvSource::new(&path).fetch(Lookback::Days(1)).unwrap();
        assert_eq!(all.len(), 40);
        let recent = CsvSource::new(&path).rolling(true).fetch(Lookback::Days(1)).unwrap();
        assert_eq!(recent.len(), 5);
        assert!((recent[0].get("co2_ppm").unwrap() - rows[35].get("co2_ppm").unwrap()).abs() < 1e-9);
    }
}
