use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for operations that may fail with [`StyleMaskError`].
pub type StyleMaskResult<T> = std::result::Result<T, StyleMaskError>;

/// Error types that can occur while building masks, compositing, or driving the pipeline.
#[derive(Debug, Error)]
pub enum StyleMaskError {
    /// ONNX Runtime inference error.
    #[error("ONNX Runtime error: {0}")]
    Ort(#[from] ort::Error),
    /// Image loading, decoding, or encoding error.
    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),
    /// File system I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Tensor shape mismatch or invalid dimensions.
    #[error("Invalid tensor shape: {0}")]
    Shape(#[from] ndarray::ShapeError),
    /// The segmentation collaborator could not be loaded or failed during inference.
    /// Recovered by the heuristic fallback, never shown to the user as a failure.
    #[error("Segmentation unavailable: {0}")]
    CollaboratorUnavailable(String),
    /// The style-transfer collaborator failed. Retryable.
    #[error("Stylization failed: {0}")]
    StylizeFailed(String),
    /// Compositor inputs disagree in size.
    #[error("Buffer size {found:?} does not match content size {expected:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        found: (u32, u32),
    },
    /// The produced mask has no included pixel.
    #[error("Mask from {origin} contains no included pixels")]
    EmptyMask { origin: &'static str },
    /// Label data does not cover the declared label buffer area.
    #[error("Label buffer {width}x{height} expects {expected} labels, got {found}")]
    LabelLength {
        width: u32,
        height: u32,
        expected: usize,
        found: usize,
    },
    /// Cleaner kernel must be odd and positive.
    #[error("Kernel size must be odd and positive, got {0}")]
    InvalidKernel(u32),
    /// A zero-sized image was supplied or requested.
    #[error("Image dimensions must be non-zero, got {width}x{height}")]
    EmptyImage { width: u32, height: u32 },
    /// An operation needs content that has not been loaded yet.
    #[error("No content image has been loaded")]
    NoContent,
    /// The mask editor is already open.
    #[error("Mask editor is already open")]
    EditorBusy,
    /// A stroke was sent while no editor session is open.
    #[error("Mask editor is not open")]
    EditorClosed,
    /// Model output did not have a supported shape.
    #[error("Unexpected model output: {0}")]
    UnexpectedOutput(String),
    /// A collaborator did not answer within the configured bound.
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),
    /// Model file not found at the specified path.
    #[error("Model file not found: {}", path.display())]
    ModelNotFound { path: PathBuf },
}
