use anyhow::{Context, Result};
use std::path::Path;

use super::HistoryRecord;

/// Downloaded history file name.
pub const HISTORY_CSV_NAME: &str = "removal_history.csv";

const HEADERS: [&str; 3] = ["Timestamp", "Original Image", "Processed Image"];

/// Render records as a CSV document with a header row.
///
/// Unlike the log, fields are quoted where needed, so names containing
/// commas survive a round trip.
pub fn history_csv(records: &[HistoryRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(HEADERS)?;
    for record in records {
        wtr.write_record([
            &record.timestamp,
            &record.original_name,
            &record.processed_filename,
        ])?;
    }
    let bytes = wtr.into_inner().context("Failed to finish history CSV")?;
    Ok(String::from_utf8(bytes)?)
}

/// Write the history CSV to `output_path`.
pub fn export_history_csv(records: &[HistoryRecord], output_path: &Path) -> Result<()> {
    let csv = history_csv(records)?;
    std::fs::write(output_path, csv)
        .with_context(|| format!("Failed to create {}", output_path.display()))
}

/// Parse a document produced by [`history_csv`] back into records.
pub fn parse_history_csv(text: &str) -> Result<Vec<HistoryRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        records.push(HistoryRecord {
            timestamp: row.get(0).unwrap_or_default().to_string(),
            original_name: row.get(1).unwrap_or_default().to_string(),
            processed_filename: row.get(2).unwrap_or_default().to_string(),
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryStore;
    use tempfile::tempdir;

    fn sample() -> Vec<HistoryRecord> {
        vec![
            HistoryRecord {
                timestamp: "2024-03-09 14:05:07".to_string(),
                original_name: "cat.jpg".to_string(),
                processed_filename: "20240309140507_processed.png".to_string(),
            },
            HistoryRecord {
                timestamp: "2024-03-09 14:06:00".to_string(),
                original_name: "dog \"best\".png".to_string(),
                processed_filename: "20240309140600_processed.png".to_string(),
            },
        ]
    }

    #[test]
    fn test_header_row() {
        let csv = history_csv(&[]).unwrap();
        assert_eq!(csv, "Timestamp,Original Image,Processed Image\n");
    }

    #[test]
    fn test_csv_matches_loaded_history() {
        let dir = tempdir().unwrap();
        let store =
            HistoryStore::with_paths(dir.path().join("log.txt"), dir.path().join("history"));
        store.append("cat.jpg", "a_processed.png").unwrap();
        store.append("dog.png", "b_processed.png").unwrap();
        let loaded = store.load().unwrap();

        let csv = history_csv(&loaded).unwrap();
        assert_eq!(parse_history_csv(&csv).unwrap(), loaded);
    }

    #[test]
    fn test_quotes_survive() {
        let records = sample();
        let csv = history_csv(&records).unwrap();
        assert!(csv.contains("\"dog \"\"best\"\".png\""));
        assert_eq!(parse_history_csv(&csv).unwrap(), records);
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(HISTORY_CSV_NAME);

        export_history_csv(&sample(), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Timestamp,Original Image,Processed Image\n"));
        assert_eq!(parse_history_csv(&text).unwrap(), sample());
    }
}
