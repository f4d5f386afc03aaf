use thiserror::Error;

/// Why a live map could not be turned into pixels.
#[derive(Debug, Error)]
pub enum RasterizeError {
    /// A drawn tile may not be read back (cross-origin without permission).
    #[error("map surface is tainted by a tile that cannot be exported")]
    Tainted,
    #[error("surface error: {0}")]
    Surface(String),
    #[error("failed to encode snapshot: {0}")]
    Encode(String),
}

impl From<image::ImageError> for RasterizeError {
    fn from(err: image::ImageError) -> Self {
        RasterizeError::Encode(err.to_string())
    }
}
