//! Background removal with the U²-Net salient object model (ONNX Runtime).

use anyhow::{anyhow, Context, Result};
use image::{imageops::FilterType, DynamicImage, GenericImageView, GrayImage, Luma};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use super::encode_png;
use crate::config::ModelConfig;

const INPUT_SIZE: u32 = 320;
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Opaque PNG-in, PNG-out background remover.
pub trait BackgroundRemover {
    fn remove(&self, png: &[u8]) -> Result<Vec<u8>>;
}

/// Cuts the foreground out using the U²-Net saliency mask as alpha.
///
/// The ONNX session is created on first use, downloading the model first if
/// no explicit path is configured.
pub struct U2NetRemover {
    config: ModelConfig,
    session: OnceLock<Mutex<Session>>,
}

impl U2NetRemover {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            session: OnceLock::new(),
        }
    }

    /// Load the model now instead of on the first removal.
    pub fn init(&self) -> Result<()> {
        self.session().map(|_| ())
    }

    fn session(&self) -> Result<&Mutex<Session>> {
        if let Some(session) = self.session.get() {
            return Ok(session);
        }

        let model_path = ensure_model(&self.config)?;
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.config.intra_threads)?
            .commit_from_file(&model_path)?;
        tracing::info!(path = ?model_path, "Background removal model loaded");

        let _ = self.session.set(Mutex::new(session));
        self.session
            .get()
            .ok_or_else(|| anyhow!("Background removal model not initialized"))
    }

    fn predict_mask(&self, img: &DynamicImage) -> Result<GrayImage> {
        let mut session = self
            .session()?
            .lock()
            .map_err(|e| anyhow!("Failed to lock background removal model: {}", e))?;
        run_u2net(&mut session, img)
    }
}

impl BackgroundRemover for U2NetRemover {
    fn remove(&self, png: &[u8]) -> Result<Vec<u8>> {
        let img = image::load_from_memory(png).context("Failed to decode removal input")?;
        let mask = self.predict_mask(&img)?;
        let cutout = apply_mask(&img, &mask);
        Ok(encode_png(&cutout)?)
    }
}

/// Download the model unless it is already on disk.
fn ensure_model(config: &ModelConfig) -> Result<PathBuf> {
    let model_path = config.model_path();
    if model_path.exists() {
        return Ok(model_path);
    }

    if config.path.is_some() {
        anyhow::bail!("Model file not found: {}", model_path.display());
    }

    std::fs::create_dir_all(&config.models_dir)?;
    tracing::info!(url = %config.url, "Downloading background removal model...");
    download(&config.url, &model_path)?;
    tracing::info!(path = ?model_path, "Background removal model downloaded");

    Ok(model_path)
}

fn download(url: &str, dest: &Path) -> Result<()> {
    let response = ureq::get(url)
        .call()
        .map_err(|e| anyhow!("Failed to download model: {}", e))?;

    // Write to a sibling first so an interrupted download is not mistaken for a model.
    let partial = dest.with_extension("onnx.part");
    let mut file = std::fs::File::create(&partial)?;
    std::io::copy(&mut response.into_reader(), &mut file)?;
    std::fs::rename(&partial, dest)?;
    Ok(())
}

/// Build the NCHW input tensor: scale by the image's brightest channel value,
/// then normalise with ImageNet statistics.
fn preprocess(img: &DynamicImage) -> Vec<f32> {
    let resized = img.resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Lanczos3);
    let rgb = resized.to_rgb8();

    let max = rgb.as_raw().iter().copied().max().unwrap_or(0).max(1) as f32;
    let plane = (INPUT_SIZE * INPUT_SIZE) as usize;
    let mut input = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let idx = (y * INPUT_SIZE + x) as usize;
        for c in 0..3 {
            input[c * plane + idx] = (pixel[c] as f32 / max - MEAN[c]) / STD[c];
        }
    }

    input
}

fn run_u2net(session: &mut Session, img: &DynamicImage) -> Result<GrayImage> {
    let input_data = preprocess(img);
    let size = INPUT_SIZE as usize;
    let input_tensor = Tensor::from_array(([1usize, 3, size, size], input_data.into_boxed_slice()))?;

    // Bound positionally so graphs with a differently named input still run
    let outputs = session.run(ort::inputs![input_tensor])?;

    // The first output is the fused saliency map, shape [1, 1, 320, 320]
    let (_name, prediction) = outputs
        .iter()
        .next()
        .ok_or_else(|| anyhow!("No saliency output"))?;
    let (_shape, data) = prediction.try_extract_tensor::<f32>()?;

    let plane = size * size;
    if data.len() < plane {
        anyhow::bail!("Unexpected saliency output length {}", data.len());
    }

    let (width, height) = img.dimensions();
    Ok(mask_from_prediction(&data[..plane], width, height))
}

/// Min-max normalise the prediction into an 8-bit mask at the source size.
fn mask_from_prediction(prediction: &[f32], width: u32, height: u32) -> GrayImage {
    let (min, max) = prediction
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = if max > min { max - min } else { 1.0 };

    let mask = GrayImage::from_fn(INPUT_SIZE, INPUT_SIZE, |x, y| {
        let v = prediction[(y * INPUT_SIZE + x) as usize];
        Luma([(((v - min) / range) * 255.0).clamp(0.0, 255.0) as u8])
    });

    image::imageops::resize(&mask, width, height, FilterType::Lanczos3)
}

/// Composite `img` over transparent black through `mask`.
///
/// Every channel, the source alpha included, is scaled by the mask value.
fn apply_mask(img: &DynamicImage, mask: &GrayImage) -> DynamicImage {
    let mut rgba = img.to_rgba8();
    for (pixel, weight) in rgba.pixels_mut().zip(mask.pixels()) {
        let weight = u16::from(weight[0]);
        for channel in pixel.0.iter_mut() {
            *channel = ((u16::from(*channel) * weight + 127) / 255) as u8;
        }
    }
    DynamicImage::ImageRgba8(rgba)
}
