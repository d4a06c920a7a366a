//! Error taxonomy for the editor core.
//!
//! Every failure is recoverable: the editor stays usable after any of these.

use thiserror::Error;

pub type Result<T, E = EditorError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("failed to load screenshot: {0}")]
    Load(#[from] LoadError),
    #[error("crop failed: {0}")]
    Crop(#[from] CropError),
    #[error("export failed: {0}")]
    Export(#[from] ExportError),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no capture found under key `{0}`")]
    MissingEntry(String),
    #[error("capture entry is malformed: {0}")]
    Malformed(String),
    #[error("capture is not a decodable PNG: {0}")]
    Decode(#[from] image::ImageError),
    #[error("capture has zero width or height")]
    Empty,
    #[error("handoff store unavailable: {0}")]
    Store(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum CropError {
    #[error("crop area too small ({width}x{height})")]
    TooSmall { width: u32, height: u32 },
    #[error("cannot copy a zero-size region ({width}x{height})")]
    ZeroSizeCopy { width: u32, height: u32 },
    #[error("region ({x},{y},{width},{height}) lies outside the {bounds_w}x{bounds_h} image")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        bounds_w: u32,
        bounds_h: u32,
    },
    #[error("another selection is in progress")]
    GestureInProgress,
    #[error("no image loaded")]
    NoDocument,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("finish the current selection before exporting")]
    GestureInProgress,
    #[error("no image loaded")]
    NoDocument,
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("clipboard unavailable: {0}")]
    Clipboard(String),
    #[error("download rejected after {attempts} attempt(s): {source}")]
    Download {
        attempts: u32,
        #[source]
        source: std::io::Error,
    },
}

impl EditorError {
    /// Short message suitable for the status line.
    pub fn user_message(&self) -> String {
        match self {
            Self::Crop(CropError::TooSmall { .. }) => "Crop area too small".to_string(),
            other => other.to_string(),
        }
    }
}
