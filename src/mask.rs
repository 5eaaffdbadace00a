use std::collections::HashSet;
use std::fmt;

use image::{GrayImage, Luma, RgbaImage};

use crate::buffer::LabelBuffer;

/// Where a mask came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskOrigin {
    /// Built from segmentation labels.
    Segmentation,
    /// Derived from the content pixels alone.
    Heuristic,
    /// Painted or corrected in the brush editor.
    Edited,
}

impl MaskOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            MaskOrigin::Segmentation => "segmentation",
            MaskOrigin::Heuristic => "heuristic",
            MaskOrigin::Edited => "editor",
        }
    }
}

impl fmt::Display for MaskOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Turn segmentation labels into a binary mask at the label buffer's own size.
///
/// A pixel is 255 exactly when its label is in `included`, otherwise 0. No resizing
/// happens here; aligning to the content size is left to the caller.
pub fn build_label_mask(labels: &LabelBuffer, included: &HashSet<i32>) -> GrayImage {
    let (w, h) = labels.dimensions();
    let mut mask = GrayImage::new(w, h);
    for (label, px) in labels.labels().iter().zip(mask.pixels_mut()) {
        let value = if included.contains(label) { 255 } else { 0 };
        *px = Luma([value]);
    }
    mask
}

/// Share of the width covered by the heuristic subject box.
const HEURISTIC_BOX_WIDTH: f32 = 0.5;
/// Share of the height covered by the heuristic subject box.
const HEURISTIC_BOX_HEIGHT: f32 = 0.6;
const HEURISTIC_MIN_ALPHA: u8 = 128;
const HEURISTIC_DARK_LIMIT: f32 = 10.0;
const HEURISTIC_BRIGHT_LIMIT: f32 = 245.0;

/// Centered box `(left, top, right, bottom)` with exclusive right/bottom edges.
fn heuristic_box(width: u32, height: u32) -> (u32, u32, u32, u32) {
    let box_w = (width as f32 * HEURISTIC_BOX_WIDTH).round() as u32;
    let box_h = (height as f32 * HEURISTIC_BOX_HEIGHT).round() as u32;
    let left = (width - box_w.min(width)) / 2;
    let top = (height - box_h.min(height)) / 2;
    (left, top, left + box_w, top + box_h)
}

/// Derive a mask from the content alone, with no model involved. Never fails.
///
/// A pixel is included when it sits inside a centered box covering half the width
/// and 60% of the height, is mostly opaque, and is neither near-black nor near-white.
pub fn heuristic_mask(content: &RgbaImage) -> GrayImage {
    let (w, h) = content.dimensions();
    let (left, top, right, bottom) = heuristic_box(w, h);

    GrayImage::from_fn(w, h, |x, y| {
        if x < left || x >= right || y < top || y >= bottom {
            return Luma([0]);
        }
        let px = content.get_pixel(x, y);
        if px[3] <= HEURISTIC_MIN_ALPHA {
            return Luma([0]);
        }
        let brightness = (u16::from(px[0]) + u16::from(px[1]) + u16::from(px[2])) as f32 / 3.0;
        if brightness > HEURISTIC_DARK_LIMIT && brightness < HEURISTIC_BRIGHT_LIMIT {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}
