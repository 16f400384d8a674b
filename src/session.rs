//! User-facing workflow: upload, edit, process, download, and history.
//!
//! A `Session` owns the in-flight edit state for one user. Nothing here is
//! persisted except the processed image and its history row, both written
//! only after the pipeline succeeds.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Local};
use image::DynamicImage;
use std::path::{Path, PathBuf};

use crate::config::{Config, UploadConfig};
use crate::history::export::{export_history_csv, HISTORY_CSV_NAME};
use crate::history::{processed_filename, HistoryRecord, HistoryStore};
use crate::pipeline::{self, BackgroundRemover, EditParams, Processed, MAX_ROTATION, MIN_ROTATION};

/// Downloaded result file name.
pub const RESULT_NAME: &str = "background_removed.png";

/// Image the user loaded, with the name it was uploaded under.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub path: PathBuf,
    pub image: DynamicImage,
}

/// The last successful pipeline run.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub processed: Processed,
    pub record: HistoryRecord,
    pub blob_path: PathBuf,
}

/// What "View History" shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryView {
    Empty,
    Table {
        records: Vec<HistoryRecord>,
        /// The most recent records whose processed image still exists on disk.
        gallery: Vec<(HistoryRecord, PathBuf)>,
    },
}

pub struct Session {
    store: HistoryStore,
    remover: Box<dyn BackgroundRemover>,
    upload_config: UploadConfig,
    gallery_size: usize,
    upload: Option<Upload>,
    params: Option<EditParams>,
    applied: Option<EditParams>,
    outcome: Option<Outcome>,
}

impl Session {
    pub fn new(config: &Config, store: HistoryStore, remover: Box<dyn BackgroundRemover>) -> Self {
        Self {
            store,
            remover,
            upload_config: config.upload.clone(),
            gallery_size: config.history.gallery_size,
            upload: None,
            params: None,
            applied: None,
            outcome: None,
        }
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    pub fn upload(&self) -> Option<&Upload> {
        self.upload.as_ref()
    }

    pub fn params(&self) -> Option<&EditParams> {
        self.params.as_ref()
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    /// True when the staged edits differ from the ones the shown result was made with.
    pub fn has_pending_edits(&self) -> bool {
        self.params.is_some() && self.params != self.applied
    }

    /// Load an image and process it with default edits.
    pub fn load_upload(&mut self, path: &Path) -> Result<&Outcome> {
        if !self.upload_config.accepts(path) {
            bail!(
                "Unsupported file type: {} (expected {})",
                path.display(),
                self.upload_config.extensions.join(", ")
            );
        }

        let image = pipeline::open_image(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        tracing::info!(original = %name, width = image.width(), height = image.height(), "Image uploaded");

        self.params = Some(EditParams::identity(&image));
        self.upload = Some(Upload {
            name,
            path: path.to_path_buf(),
            image,
        });
        self.outcome = None;
        self.applied = None;

        self.apply()
    }

    /// Run the pipeline on the current upload and staged edits, then persist.
    pub fn apply(&mut self) -> Result<&Outcome> {
        self.apply_at(Local::now())
    }

    /// [`apply`](Self::apply) with an explicit clock reading. The log row and
    /// the blob name both come from `now`.
    pub fn apply_at(&mut self, now: DateTime<Local>) -> Result<&Outcome> {
        let upload = self.upload.as_ref().ok_or_else(|| anyhow!("No image uploaded"))?;
        let params = self
            .params
            .unwrap_or_else(|| EditParams::identity(&upload.image));

        let processed = pipeline::process(&upload.image, &params, &*self.remover)?;

        let filename = processed_filename(&now);
        let blob_path = self.store.save_blob(&processed.output, &filename)?;
        let record = self.store.append_at(&now, &upload.name, &filename)?;

        tracing::info!(
            original = %record.original_name,
            processed = %record.processed_filename,
            rotation = params.rotation_degrees,
            "Background removed"
        );

        self.applied = Some(params);
        Ok(self.outcome.insert(Outcome {
            processed,
            record,
            blob_path,
        }))
    }

    /// Crop and rotate the current upload without running the model.
    pub fn preview_edit(&self) -> Result<Option<DynamicImage>> {
        match (&self.upload, &self.params) {
            (Some(upload), Some(params)) => Ok(Some(pipeline::edit(&upload.image, params)?)),
            _ => Ok(None),
        }
    }

    pub fn set_rotation(&mut self, degrees: i32) {
        if let Some(params) = self.params.as_mut() {
            params.rotation_degrees = degrees.clamp(MIN_ROTATION, MAX_ROTATION);
        }
    }

    pub fn rotate_by(&mut self, delta: i32) {
        if let Some(current) = self.params.map(|p| p.rotation_degrees) {
            self.set_rotation(current.saturating_add(delta));
        }
    }

    /// Move the crop box by a fraction of the image size.
    pub fn nudge_crop(&mut self, dx_percent: i64, dy_percent: i64) {
        self.update_crop(|crop, w, h| {
            crop.translate(step(w, dx_percent), step(h, dy_percent), w, h)
        });
    }

    /// Grow or shrink the crop box by a fraction of the image size.
    pub fn resize_crop(&mut self, dw_percent: i64, dh_percent: i64) {
        self.update_crop(|crop, w, h| crop.resize(step(w, dw_percent), step(h, dh_percent), w, h));
    }

    /// Back to the full image and no rotation.
    pub fn reset_edits(&mut self) {
        if let Some(upload) = &self.upload {
            self.params = Some(EditParams::identity(&upload.image));
        }
    }

    fn update_crop(
        &mut self,
        f: impl FnOnce(&pipeline::CropRegion, u32, u32) -> pipeline::CropRegion,
    ) {
        if let (Some(upload), Some(params)) = (&self.upload, self.params.as_mut()) {
            params.crop = f(&params.crop, upload.image.width(), upload.image.height());
        }
    }

    /// Save the processed image as `background_removed.png` inside `dir`.
    pub fn download_result(&self, dir: &Path) -> Result<PathBuf> {
        let outcome = self
            .outcome
            .as_ref()
            .ok_or_else(|| anyhow!("Nothing to download yet"))?;

        std::fs::create_dir_all(dir)?;
        let path = dir.join(RESULT_NAME);
        let png = pipeline::encode_png(&outcome.processed.output)?;
        std::fs::write(&path, png).with_context(|| format!("Failed to write {}", path.display()))?;

        tracing::info!(path = ?path, "Result downloaded");
        Ok(path)
    }

    pub fn view_history(&self) -> Result<HistoryView> {
        let records = self.store.load()?;
        if records.is_empty() {
            return Ok(HistoryView::Empty);
        }

        let gallery = self
            .store
            .recent(self.gallery_size)?
            .into_iter()
            .filter(|r| self.store.blob_exists(&r.processed_filename))
            .map(|r| {
                let path = self.store.blob_path(&r.processed_filename);
                (r, path)
            })
            .collect();

        Ok(HistoryView::Table { records, gallery })
    }

    /// Save the full history as `removal_history.csv` inside `dir`.
    pub fn download_history(&self, dir: &Path) -> Result<PathBuf> {
        let records = self.store.load()?;
        std::fs::create_dir_all(dir)?;
        let path = dir.join(HISTORY_CSV_NAME);
        export_history_csv(&records, &path)?;

        tracing::info!(path = ?path, records = records.len(), "History downloaded");
        Ok(path)
    }

    /// Wipe the log and every stored image. The current upload stays loaded.
    pub fn clear_history(&self) -> Result<usize> {
        self.store.clear()
    }
}

fn step(extent: u32, percent: i64) -> i64 {
    if percent == 0 {
        return 0;
    }
    let magnitude = (i64::from(extent) * percent.abs() / 100).max(1);
    magnitude * percent.signum()
}
