/// Errors raised while turning an upload into a cut-out image.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the upload or the remover's output.
    #[error("failed to decode image")]
    ImageDecode(#[source] image::ImageError),

    /// Failed to encode an intermediate or final PNG.
    #[error("failed to encode image")]
    ImageEncode(#[source] image::ImageError),

    /// Crop box does not fit inside the image.
    #[error("crop {width}x{height}+{x}+{y} does not fit a {image_width}x{image_height} image")]
    InvalidCrop {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        image_width: u32,
        image_height: u32,
    },

    /// Rotation outside [-180, 180] degrees.
    #[error("rotation {0}° is outside [-180, 180]")]
    InvalidRotation(i32),

    /// The background remover failed.
    #[error("background removal failed")]
    Removal(#[source] anyhow::Error),
}
