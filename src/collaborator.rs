//! Contracts for the external models the pipeline consumes.
//!
//! Both collaborators are resolved once, when the pipeline is built, into a
//! [`Collaborator`] handle that is either ready or known to be unavailable.

use std::fmt;

use image::RgbaImage;

use crate::StyleMaskResult;
use crate::buffer::LabelBuffer;

/// Produces per-pixel semantic labels for a content image.
#[allow(async_fn_in_trait)]
pub trait Segmenter {
    /// Label the content. `Ok(None)` means the model ran but found no subject.
    async fn segment(&self, content: &RgbaImage) -> StyleMaskResult<Option<LabelBuffer>>;
}

/// Renders the content image in the look of a style image.
#[allow(async_fn_in_trait)]
pub trait Stylizer {
    /// Any size is allowed for the result; the pipeline aligns it to the content.
    async fn stylize(&self, content: &RgbaImage, style: &RgbaImage) -> StyleMaskResult<RgbaImage>;
}

/// A model handle whose availability was decided once at construction.
pub enum Collaborator<T> {
    Ready(T),
    Unavailable { reason: String },
}

impl<T> Collaborator<T> {
    pub fn ready(inner: T) -> Self {
        Collaborator::Ready(inner)
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Collaborator::Unavailable {
            reason: reason.into(),
        }
    }

    /// Keep a successfully loaded model, or remember why loading failed.
    pub fn from_result<E: fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(inner) => Collaborator::Ready(inner),
            Err(err) => {
                tracing::warn!(error = %err, "collaborator failed to load");
                Collaborator::Unavailable {
                    reason: err.to_string(),
                }
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Collaborator::Ready(_))
    }

    pub fn get(&self) -> Option<&T> {
        match self {
            Collaborator::Ready(inner) => Some(inner),
            Collaborator::Unavailable { .. } => None,
        }
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        match self {
            Collaborator::Ready(_) => None,
            Collaborator::Unavailable { reason } => Some(reason),
        }
    }
}

impl<T> fmt::Debug for Collaborator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collaborator::Ready(_) => f.write_str("Ready"),
            Collaborator::Unavailable { reason } => {
                f.debug_struct("Unavailable").field("reason", reason).finish()
            }
        }
    }
}

/// Segmenter for setups without a segmentation model; every image takes the heuristic path.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSegmenter;

impl Segmenter for NoSegmenter {
    async fn segment(&self, _content: &RgbaImage) -> StyleMaskResult<Option<LabelBuffer>> {
        Ok(None)
    }
}
