//! Crop → rotate → background removal.
//!
//! Every call runs the whole chain, model inference included. Nothing is
//! cached between calls.

mod error;
pub mod remover;

use image::{DynamicImage, ImageFormat, Rgba};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use std::io::Cursor;
use std::path::Path;

pub use error::PipelineError;
pub use remover::{BackgroundRemover, U2NetRemover};

pub const MIN_ROTATION: i32 = -180;
pub const MAX_ROTATION: i32 = 180;

/// Rectangular selection in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRegion {
    /// The default selection: the whole image.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn fits(&self, image_width: u32, image_height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && u64::from(self.x) + u64::from(self.width) <= u64::from(image_width)
            && u64::from(self.y) + u64::from(self.height) <= u64::from(image_height)
    }

    /// Move the box, keeping it inside the image.
    pub fn translate(&self, dx: i64, dy: i64, image_width: u32, image_height: u32) -> Self {
        let max_x = i64::from(image_width.saturating_sub(self.width));
        let max_y = i64::from(image_height.saturating_sub(self.height));
        Self {
            x: (i64::from(self.x) + dx).clamp(0, max_x) as u32,
            y: (i64::from(self.y) + dy).clamp(0, max_y) as u32,
            ..*self
        }
    }

    /// Grow or shrink the box from its bottom-right corner.
    ///
    /// The box never drops below 1x1 and never extends past the image edge.
    pub fn resize(&self, dw: i64, dh: i64, image_width: u32, image_height: u32) -> Self {
        let max_w = i64::from(image_width.saturating_sub(self.x)).max(1);
        let max_h = i64::from(image_height.saturating_sub(self.y)).max(1);
        Self {
            width: (i64::from(self.width) + dw).clamp(1, max_w) as u32,
            height: (i64::from(self.height) + dh).clamp(1, max_h) as u32,
            ..*self
        }
    }
}

/// User edits applied before background removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditParams {
    pub crop: CropRegion,
    /// Counter-clockwise degrees, within [-180, 180].
    pub rotation_degrees: i32,
}

impl EditParams {
    /// Full-image crop, no rotation.
    pub fn identity(image: &DynamicImage) -> Self {
        Self {
            crop: CropRegion::full(image.width(), image.height()),
            rotation_degrees: 0,
        }
    }
}

/// Result of one pipeline run.
#[derive(Debug, Clone)]
pub struct Processed {
    /// Cropped and rotated input, as shown next to the result.
    pub edited: DynamicImage,
    /// Background-removed output.
    pub output: DynamicImage,
}

pub fn open_image(path: &Path) -> Result<DynamicImage, PipelineError> {
    image::open(path).map_err(PipelineError::ImageDecode)
}

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, PipelineError> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(PipelineError::ImageEncode)?;
    Ok(buf.into_inner())
}

/// Crop then rotate. This is the part of the pipeline that runs without the model.
pub fn edit(source: &DynamicImage, params: &EditParams) -> Result<DynamicImage, PipelineError> {
    if !(MIN_ROTATION..=MAX_ROTATION).contains(&params.rotation_degrees) {
        return Err(PipelineError::InvalidRotation(params.rotation_degrees));
    }

    let crop = params.crop;
    if !crop.fits(source.width(), source.height()) {
        return Err(PipelineError::InvalidCrop {
            x: crop.x,
            y: crop.y,
            width: crop.width,
            height: crop.height,
            image_width: source.width(),
            image_height: source.height(),
        });
    }

    let cropped = source.crop_imm(crop.x, crop.y, crop.width, crop.height);
    Ok(rotate(cropped, params.rotation_degrees))
}

/// Rotate counter-clockwise about the centre, keeping the canvas size.
/// Corners uncovered by the rotation become transparent.
fn rotate(image: DynamicImage, degrees: i32) -> DynamicImage {
    match degrees {
        0 => image,
        180 | -180 => image.rotate180(),
        _ => {
            let rgba = image.to_rgba8();
            // imageproc turns clockwise for positive angles
            let theta = -(degrees as f32).to_radians();
            DynamicImage::ImageRgba8(rotate_about_center(
                &rgba,
                theta,
                Interpolation::Bilinear,
                Rgba([0, 0, 0, 0]),
            ))
        }
    }
}

/// Run the full chain on `source`.
///
/// The edited image is PNG-encoded, passed through `remover`, and the bytes
/// it returns are decoded as the result. Failures are not retried.
pub fn process(
    source: &DynamicImage,
    params: &EditParams,
    remover: &dyn BackgroundRemover,
) -> Result<Processed, PipelineError> {
    let edited = edit(source, params)?;
    let png = encode_png(&edited)?;
    let removed = remover.remove(&png).map_err(PipelineError::Removal)?;
    let output = image::load_from_memory(&removed).map_err(PipelineError::ImageDecode)?;

    tracing::debug!(
        width = output.width(),
        height = output.height(),
        rotation = params.rotation_degrees,
        "Pipeline finished"
    );
    Ok(Processed { edited, output })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use image::{GenericImageView, Rgb, RgbImage};

    /// Makes every pixel half transparent, standing in for the model.
    pub(crate) struct HalfAlpha;

    impl BackgroundRemover for HalfAlpha {
        fn remove(&self, png: &[u8]) -> Result<Vec<u8>> {
            let mut rgba = image::load_from_memory(png)?.to_rgba8();
            for pixel in rgba.pixels_mut() {
                pixel[3] /= 2;
            }
            Ok(encode_png(&DynamicImage::ImageRgba8(rgba))?)
        }
    }

    pub(crate) struct Broken;

    impl BackgroundRemover for Broken {
        fn remove(&self, _png: &[u8]) -> Result<Vec<u8>> {
            Err(anyhow!("model unavailable"))
        }
    }

    pub(crate) fn sample_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 11 % 256) as u8, 128])
        }))
    }

    #[test]
    fn test_identity_keeps_dimensions_for_any_rotation() {
        let source = sample_image(40, 30);
        for degrees in [-180, -135, -90, -1, 0, 1, 45, 90, 179, 180] {
            let params = EditParams {
                rotation_degrees: degrees,
                ..EditParams::identity(&source)
            };
            let processed = process(&source, &params, &HalfAlpha).unwrap();
            assert_eq!(processed.output.dimensions(), (40, 30), "rotation {}", degrees);
            assert!(processed.output.color().has_alpha());
        }
    }

    #[test]
    fn test_crop_applies_before_rotation() {
        let source = sample_image(50, 40);
        let params = EditParams {
            crop: CropRegion { x: 10, y: 5, width: 20, height: 10 },
            rotation_degrees: 0,
        };

        let processed = process(&source, &params, &HalfAlpha).unwrap();
        assert_eq!(processed.edited.dimensions(), (20, 10));
        assert_eq!(
            processed.edited.get_pixel(0, 0),
            source.get_pixel(10, 5)
        );
        assert_eq!(processed.output.dimensions(), (20, 10));
    }

    #[test]
    fn test_half_turn_is_exact() {
        let source = sample_image(6, 4);
        let params = EditParams {
            rotation_degrees: 180,
            ..EditParams::identity(&source)
        };

        let edited = edit(&source, &params).unwrap();
        assert_eq!(edited.get_pixel(0, 0), source.get_pixel(5, 3));
    }

    #[test]
    fn test_rotation_out_of_range() {
        let source = sample_image(10, 10);
        let params = EditParams {
            rotation_degrees: 181,
            ..EditParams::identity(&source)
        };
        assert!(matches!(
            process(&source, &params, &HalfAlpha),
            Err(PipelineError::InvalidRotation(181))
        ));
    }

    #[test]
    fn test_crop_out_of_bounds() {
        let source = sample_image(10, 10);
        let params = EditParams {
            crop: CropRegion { x: 5, y: 0, width: 6, height: 10 },
            rotation_degrees: 0,
        };
        assert!(matches!(
            edit(&source, &params),
            Err(PipelineError::InvalidCrop { .. })
        ));
    }

    #[test]
    fn test_remover_failure_propagates() {
        let source = sample_image(10, 10);
        let result = process(&source, &EditParams::identity(&source), &Broken);
        assert!(matches!(result, Err(PipelineError::Removal(_))));
    }

    #[test]
    fn test_crop_translate_and_resize_clamp() {
        let crop = CropRegion { x: 0, y: 0, width: 20, height: 20 };

        let moved = crop.translate(500, -5, 100, 50);
        assert_eq!((moved.x, moved.y), (80, 0));

        let grown = moved.resize(100, 100, 100, 50);
        assert_eq!((grown.width, grown.height), (20, 50));

        let shrunk = crop.resize(-100, -100, 100, 50);
        assert_eq!((shrunk.width, shrunk.height), (1, 1));
        assert!(shrunk.fits(100, 50));
    }

    #[test]
    fn test_encode_png_signature() {
        let png = encode_png(&sample_image(3, 3)).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
