//! Raster types shared by every stage: RGBA pixel buffers, grayscale masks and
//! per-pixel label buffers from the segmentation model.

use std::path::Path;

use image::{GrayImage, Luma, Rgba, RgbaImage};

use crate::{StyleMaskError, StyleMaskResult};

/// Label reserved for "no subject at this pixel".
pub const NO_SUBJECT: i32 = -1;

/// Per-pixel semantic labels, row-major, possibly at a different size than the content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelBuffer {
    width: u32,
    height: u32,
    labels: Vec<i32>,
}

impl LabelBuffer {
    /// Wrap raw labels, checking they cover exactly `width * height` pixels.
    pub fn new(width: u32, height: u32, labels: Vec<i32>) -> StyleMaskResult<Self> {
        let expected = width as usize * height as usize;
        if labels.len() != expected {
            return Err(StyleMaskError::LabelLength {
                width,
                height,
                expected,
                found: labels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            labels,
        })
    }

    /// Build a label buffer from rows of labels. All rows must have the same length.
    pub fn from_rows<R: AsRef<[i32]>>(rows: &[R]) -> StyleMaskResult<Self> {
        let height = rows.len() as u32;
        let width = rows.first().map_or(0, |row| row.as_ref().len()) as u32;
        let labels: Vec<i32> = rows
            .iter()
            .flat_map(|row| row.as_ref().iter().copied())
            .collect();
        Self::new(width, height, labels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn labels(&self) -> &[i32] {
        &self.labels
    }

    /// Label at `(x, y)`, or `None` outside the buffer.
    pub fn get(&self, x: u32, y: u32) -> Option<i32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.labels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// True when there is nothing to build a mask from: zero area or only the sentinel.
    pub fn is_empty(&self) -> bool {
        self.labels.iter().all(|&label| label == NO_SUBJECT)
    }
}

/// Expand a single-channel mask into the RGBA form (R=G=B=v, A=255).
pub fn mask_to_rgba(mask: &GrayImage) -> RgbaImage {
    let (w, h) = mask.dimensions();
    let mut out = RgbaImage::new(w, h);
    for (mask_px, out_px) in mask.pixels().zip(out.pixels_mut()) {
        let v = mask_px[0];
        *out_px = Rgba([v, v, v, 255]);
    }
    out
}

/// Finalize an RGBA mask that may still carry alpha into a single-channel mask.
///
/// Intensity is taken from the red channel and attenuated by alpha, so a
/// half-transparent white pixel becomes a half-included one.
pub fn flatten_mask(rgba: &RgbaImage) -> GrayImage {
    let (w, h) = rgba.dimensions();
    let mut out = GrayImage::new(w, h);
    for (px, out_px) in rgba.pixels().zip(out.pixels_mut()) {
        let v = (u16::from(px[0]) * u16::from(px[3]) + 127) / 255;
        *out_px = Luma([v as u8]);
    }
    out
}

/// Fraction of pixels counted as included (intensity above 128).
pub fn mask_coverage(mask: &GrayImage) -> f32 {
    let total = mask.width() as usize * mask.height() as usize;
    if total == 0 {
        return 0.0;
    }
    let included = mask.pixels().filter(|px| px[0] > 128).count();
    included as f32 / total as f32
}

/// True when no pixel of the mask is even partially included.
pub fn is_mask_empty(mask: &GrayImage) -> bool {
    mask.pixels().all(|px| px[0] == 0)
}

/// Reject zero-sized buffers.
pub fn ensure_non_empty(width: u32, height: u32) -> StyleMaskResult<()> {
    if width == 0 || height == 0 {
        return Err(StyleMaskError::EmptyImage { width, height });
    }
    Ok(())
}

/// Open any supported image file as an RGBA pixel buffer.
pub fn load_rgba(path: impl AsRef<Path>) -> StyleMaskResult<RgbaImage> {
    let image = image::open(path.as_ref())?;
    Ok(image.to_rgba8())
}

/// Open an image file as a mask. Color masks are finalized through [`flatten_mask`].
pub fn load_mask(path: impl AsRef<Path>) -> StyleMaskResult<GrayImage> {
    let image = image::open(path.as_ref())?;
    Ok(flatten_mask(&image.to_rgba8()))
}
