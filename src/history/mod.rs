//! Append-only history of processed images.
//!
//! The log is a plain comma-joined text file with no header and no quoting.
//! Each row names a PNG in the blob directory. Rows are parsed positionally,
//! so a comma inside an uploaded filename shifts the remaining columns.

pub mod export;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use image::{DynamicImage, ImageFormat};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::HistoryConfig;

pub use export::{export_history_csv, history_csv, parse_history_csv};

/// Log timestamp format.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Compact timestamp used to name processed images.
pub const FILENAME_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
    pub timestamp: String,
    pub original_name: String,
    pub processed_filename: String,
}

impl HistoryRecord {
    fn to_line(&self) -> String {
        format!(
            "{},{},{}\n",
            self.timestamp, self.original_name, self.processed_filename
        )
    }
}

/// Name of the blob written for a result produced at `timestamp`.
///
/// Second granularity: two results within the same second share a name and
/// the later one overwrites the earlier file.
pub fn processed_filename(timestamp: &DateTime<Local>) -> String {
    format!("{}_processed.png", timestamp.format(FILENAME_TIMESTAMP_FORMAT))
}

pub struct HistoryStore {
    log_path: PathBuf,
    blob_dir: PathBuf,
}

impl HistoryStore {
    pub fn new(config: &HistoryConfig) -> Self {
        Self::with_paths(config.log_path.clone(), config.blob_dir.clone())
    }

    pub fn with_paths(log_path: PathBuf, blob_dir: PathBuf) -> Self {
        Self { log_path, blob_dir }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn blob_dir(&self) -> &Path {
        &self.blob_dir
    }

    /// Create the blob directory if it does not exist yet.
    pub fn ensure_blob_dir(&self) -> Result<()> {
        if !self.blob_dir.exists() {
            fs::create_dir_all(&self.blob_dir).with_context(|| {
                format!("Failed to create history directory {}", self.blob_dir.display())
            })?;
        }
        Ok(())
    }

    pub fn blob_path(&self, filename: &str) -> PathBuf {
        self.blob_dir.join(filename)
    }

    pub fn blob_exists(&self, filename: &str) -> bool {
        self.blob_path(filename).is_file()
    }

    /// Write a processed image into the blob directory as PNG.
    pub fn save_blob(&self, image: &DynamicImage, filename: &str) -> Result<PathBuf> {
        self.ensure_blob_dir()?;
        let path = self.blob_path(filename);
        image
            .save_with_format(&path, ImageFormat::Png)
            .with_context(|| format!("Failed to save {}", path.display()))?;
        Ok(path)
    }

    /// Append a record stamped with the current local time.
    pub fn append(&self, original_name: &str, processed_filename: &str) -> Result<HistoryRecord> {
        self.append_at(&Local::now(), original_name, processed_filename)
    }

    /// Append a record with a caller-supplied timestamp.
    ///
    /// The log file (and its parent directory) is created on first use.
    pub fn append_at(
        &self,
        timestamp: &DateTime<Local>,
        original_name: &str,
        processed_filename: &str,
    ) -> Result<HistoryRecord> {
        let record = HistoryRecord {
            timestamp: timestamp.format(TIMESTAMP_FORMAT).to_string(),
            original_name: original_name.to_string(),
            processed_filename: processed_filename.to_string(),
        };

        if let Some(parent) = self.log_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .with_context(|| format!("Failed to open history log {}", self.log_path.display()))?;
        file.write_all(record.to_line().as_bytes())?;

        tracing::debug!(
            original = %record.original_name,
            processed = %record.processed_filename,
            "History record appended"
        );
        Ok(record)
    }

    /// Read every record in append order. A missing log reads as empty.
    pub fn load(&self) -> Result<Vec<HistoryRecord>> {
        let mut reader = match csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_path(&self.log_path)
        {
            Ok(reader) => reader,
            Err(e) if is_not_found(&e) => return Ok(Vec::new()),
            Err(e) => return Err(e).context("Failed to open history log"),
        };

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row.context("Failed to read history log")?;
            records.push(HistoryRecord {
                timestamp: row.get(0).unwrap_or_default().to_string(),
                original_name: row.get(1).unwrap_or_default().to_string(),
                processed_filename: row.get(2).unwrap_or_default().to_string(),
            });
        }

        Ok(records)
    }

    /// The last `count` records in log order.
    pub fn recent(&self, count: usize) -> Result<Vec<HistoryRecord>> {
        let mut records = self.load()?;
        let skip = records.len().saturating_sub(count);
        Ok(records.split_off(skip))
    }

    /// Empty the log, then delete everything in the blob directory.
    ///
    /// Not atomic: the log is truncated first, so a failed deletion leaves
    /// blobs on disk that no row refers to. Returns the number of entries
    /// removed.
    pub fn clear(&self) -> Result<usize> {
        if let Some(parent) = self.log_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::File::create(&self.log_path)
            .with_context(|| format!("Failed to truncate {}", self.log_path.display()))?;

        self.ensure_blob_dir()?;

        let mut removed = 0;
        for entry in fs::read_dir(&self.blob_dir)? {
            let entry = entry?;
            let path = entry.path();
            let deleted = if entry.file_type()?.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            deleted.with_context(|| format!("Failed to delete {}", path.display()))?;
            removed += 1;
        }

        tracing::info!(removed, "History cleared");
        Ok(removed)
    }
}

fn is_not_found(err: &csv::Error) -> bool {
    matches!(err.kind(), csv::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::RgbaImage;
    use tempfile::{tempdir, TempDir};

    fn store_in(dir: &TempDir) -> HistoryStore {
        HistoryStore::with_paths(dir.path().join("history_log.txt"), dir.path().join("history"))
    }

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn test_append_then_load() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        store.append("first.png", "a_processed.png").unwrap();
        let appended = store.append("cat.jpg", "20240309140507_processed.png").unwrap();

        let records = store.load().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records.last(), Some(&appended));
        assert_eq!(records[1].original_name, "cat.jpg");
        assert_eq!(records[1].processed_filename, "20240309140507_processed.png");
    }

    #[test]
    fn test_line_format() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        store
            .append_at(&fixed_time(), "cat.jpg", "20240309140507_processed.png")
            .unwrap();

        let raw = fs::read_to_string(store.log_path()).unwrap();
        assert_eq!(raw, "2024-03-09 14:05:07,cat.jpg,20240309140507_processed.png\n");
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        assert!(store.load().unwrap().is_empty());
        assert!(!store.log_path().exists());
    }

    #[test]
    fn test_comma_in_name_shifts_fields() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        store
            .append_at(&fixed_time(), "me, myself.jpg", "20240309140507_processed.png")
            .unwrap();

        let records = store.load().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].original_name, "me");
        assert_eq!(records[0].processed_filename, " myself.jpg");
    }

    #[test]
    fn test_quotes_in_name_are_literal() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        store.append_at(&fixed_time(), "\"cat\".jpg", "a_processed.png").unwrap();
        store.append_at(&fixed_time(), "\"open.jpg", "b_processed.png").unwrap();
        store.append_at(&fixed_time(), "dog.jpg", "c_processed.png").unwrap();

        let records = store.load().unwrap();
        let names: Vec<_> = records.iter().map(|r| r.original_name.as_str()).collect();
        assert_eq!(names, vec!["\"cat\".jpg", "\"open.jpg", "dog.jpg"]);
        assert_eq!(records[1].processed_filename, "b_processed.png");
        assert_eq!(records[2].processed_filename, "c_processed.png");
    }

    #[test]
    fn test_short_rows_and_blank_lines() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(store.log_path(), "2024-01-01 00:00:00,only.jpg\n\n2024-01-01 00:00:01,b.jpg,b.png\n")
            .unwrap();

        let records = store.load().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].processed_filename, "");
        assert_eq!(records[1].original_name, "b.jpg");
    }

    #[test]
    fn test_duplicate_timestamps_are_kept() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        store.append_at(&fixed_time(), "a.jpg", "x.png").unwrap();
        store.append_at(&fixed_time(), "a.jpg", "x.png").unwrap();

        let records = store.load().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], records[1]);
    }

    #[test]
    fn test_recent_keeps_log_order() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        for i in 0..7 {
            store.append(&format!("{}.jpg", i), &format!("{}.png", i)).unwrap();
        }

        let recent = store.recent(5).unwrap();
        let names: Vec<_> = recent.iter().map(|r| r.original_name.as_str()).collect();
        assert_eq!(names, vec!["2.jpg", "3.jpg", "4.jpg", "5.jpg", "6.jpg"]);

        assert_eq!(store.recent(50).unwrap().len(), 7);
    }

    #[test]
    fn test_processed_filename_format() {
        assert_eq!(processed_filename(&fixed_time()), "20240309140507_processed.png");
    }

    #[test]
    fn test_save_blob_writes_png() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let image = DynamicImage::ImageRgba8(RgbaImage::new(4, 3));

        let path = store.save_blob(&image, "x_processed.png").unwrap();
        assert!(store.blob_exists("x_processed.png"));

        let reloaded = image::open(path).unwrap();
        assert_eq!((reloaded.width(), reloaded.height()), (4, 3));
    }

    #[test]
    fn test_clear_empties_log_and_blobs() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        store.ensure_blob_dir().unwrap();
        let image = DynamicImage::ImageRgba8(RgbaImage::new(2, 2));

        for i in 0..3 {
            let name = format!("2024030914050{}_processed.png", i);
            store.save_blob(&image, &name).unwrap();
            store.append(&format!("{}.jpg", i), &name).unwrap();
        }
        assert_eq!(store.load().unwrap().len(), 3);

        let removed = store.clear().unwrap();
        assert_eq!(removed, 3);
        assert_eq!(fs::metadata(store.log_path()).unwrap().len(), 0);
        assert!(store.blob_dir().is_dir());
        assert_eq!(fs::read_dir(store.blob_dir()).unwrap().count(), 0);
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_clear_removes_unreferenced_entries() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        store.ensure_blob_dir().unwrap();
        fs::write(store.blob_path("stray.txt"), b"x").unwrap();
        fs::create_dir(store.blob_path("nested")).unwrap();

        store.clear().unwrap();

        assert!(store.log_path().exists());
        assert_eq!(fs::read_dir(store.blob_dir()).unwrap().count(), 0);
    }
}
