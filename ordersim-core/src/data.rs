//! CSV bar loading.
//!
//! Expected header: `timestamp,open,high,low,close[,volume]`. Timestamps are
//! `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD HH:MM:SS` or a bare `YYYY-MM-DD`
//! (midnight). Rows must be strictly increasing in time.

use crate::domain::Bar;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: unrecognized timestamp {value:?}")]
    Timestamp { row: usize, value: String },

    #[error("row {row}: timestamp {timestamp} does not follow the previous bar")]
    NonIncreasing { row: usize, timestamp: NaiveDateTime },
}

#[derive(Debug, Deserialize)]
struct BarRecord {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

/// Parse a bar or plan timestamp.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Read bars from any CSV source.
pub fn read_bars<R: Read>(reader: R) -> Result<Vec<Bar>, DataError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut bars: Vec<Bar> = Vec::new();
    for (i, record) in rdr.deserialize::<BarRecord>().enumerate() {
        let row = i + 1;
        let record = record?;
        let timestamp = parse_timestamp(&record.timestamp).ok_or_else(|| DataError::Timestamp {
            row,
            value: record.timestamp.clone(),
        })?;

        if let Some(prev) = bars.last() {
            if timestamp <= prev.timestamp {
                return Err(DataError::NonIncreasing { row, timestamp });
            }
        }

        let bar = Bar {
            timestamp,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume,
        };
        if !bar.is_sane() {
            warn!(row, %timestamp, "bar fails OHLC sanity check");
        }
        bars.push(bar);
    }

    debug!(count = bars.len(), "bars loaded");
    Ok(bars)
}

/// Read bars from a CSV file.
pub fn load_bars(path: &Path) -> Result<Vec<Bar>, DataError> {
    let file = File::open(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_bars(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
timestamp,open,high,low,close,volume
2024-01-02,100,105,95,100,1000
2024-01-03T00:00:00,100,112,104,110,1200
";

    #[test]
    fn reads_both_timestamp_forms() {
        let bars = read_bars(CSV.as_bytes()).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].timestamp, parse_timestamp("2024-01-02T00:00:00").unwrap());
        assert_eq!(bars[1].high, 112.0);
        assert_eq!(bars[1].volume, 1200.0);
    }

    #[test]
    fn volume_column_is_optional() {
        let csv = "timestamp,open,high,low,close\n2024-01-02,1,2,0.5,1.5\n";
        let bars = read_bars(csv.as_bytes()).unwrap();
        assert_eq!(bars[0].volume, 0.0);
    }

    #[test]
    fn rejects_bad_timestamp() {
        let csv = "timestamp,open,high,low,close\nyesterday,1,2,0.5,1.5\n";
        let err = read_bars(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, DataError::Timestamp { row: 1, .. }));
    }

    #[test]
    fn rejects_out_of_order_rows() {
        let csv = "\
timestamp,open,high,low,close
2024-01-03,1,2,0.5,1.5
2024-01-03,1,2,0.5,1.5
";
        let err = read_bars(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, DataError::NonIncreasing { row: 2, .. }));
    }

    #[test]
    fn insane_bars_are_kept() {
        // high below low is reported, not dropped
        let csv = "timestamp,open,high,low,close\n2024-01-02,1,0.5,2,1\n";
        let bars = read_bars(csv.as_bytes()).unwrap();
        assert_eq!(bars.len(), 1);
        assert!(!bars[0].is_sane());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_bars(Path::new("/nonexistent/bars.csv")).unwrap_err();
        assert!(matches!(err, DataError::Io { .. }));
    }
}
