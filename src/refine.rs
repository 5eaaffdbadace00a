use image::{GrayImage, Luma};
use imageproc::contrast::{ThresholdType, threshold as ip_threshold};
use imageproc::distance_transform::euclidean_squared_distance_transform;
use imageproc::filter::gaussian_blur_f32;

use crate::config::MaskProcessingOptions;
use crate::{StyleMaskError, StyleMaskResult};

/// Intensity above which a mask pixel counts as included.
pub const INCLUDED_LEVEL: u8 = 128;
/// Minimum number of included pixels a neighbourhood needs for its center to survive.
pub const CLEAN_MIN_NEIGHBORS: usize = 2;

/// A single transformation step applied to a mask before compositing.
#[derive(Debug, Clone, PartialEq)]
pub enum MaskOperation {
    Clean { kernel: u32 },
    Threshold { value: u8 },
    Dilate { radius: f32 },
    Feather { sigma: f32 },
}

impl MaskOperation {
    pub fn apply(&self, input: &GrayImage) -> StyleMaskResult<GrayImage> {
        Ok(match self {
            MaskOperation::Clean { kernel } => clean_mask(input, *kernel)?,
            MaskOperation::Threshold { value } => ip_threshold(input, *value, ThresholdType::Binary),
            MaskOperation::Dilate { radius } => dilate_mask(input, *radius),
            MaskOperation::Feather { sigma } => feather_mask(input, *sigma),
        })
    }
}

/// Run a list of operations in order, returning the transformed mask.
pub fn apply_operations(source: &GrayImage, operations: &[MaskOperation]) -> StyleMaskResult<GrayImage> {
    let mut current = source.clone();
    for op in operations {
        current = op.apply(&current)?;
    }
    Ok(current)
}

/// The cleaner pass followed by whichever optional steps the options enable.
pub fn operations_from_options(options: &MaskProcessingOptions) -> Vec<MaskOperation> {
    let mut operations = vec![MaskOperation::Clean {
        kernel: options.clean_kernel,
    }];
    if let Some(value) = options.threshold {
        operations.push(MaskOperation::Threshold { value });
    }
    if let Some(radius) = options.dilation_radius {
        operations.push(MaskOperation::Dilate { radius });
    }
    if let Some(sigma) = options.feather_sigma {
        operations.push(MaskOperation::Feather { sigma });
    }
    operations
}

/// Remove isolated specks with one pass of conditional erosion.
///
/// Every pixel at least `kernel / 2` away from the border looks at its `kernel x kernel`
/// neighbourhood (itself included) in the input. Fewer than [`CLEAN_MIN_NEIGHBORS`]
/// included pixels there turns it off; otherwise it is copied unchanged. Border pixels
/// are never touched and nothing is ever turned on. Running it again may erode more.
pub fn clean_mask(mask: &GrayImage, kernel: u32) -> StyleMaskResult<GrayImage> {
    if kernel == 0 || kernel % 2 == 0 {
        return Err(StyleMaskError::InvalidKernel(kernel));
    }

    let (w, h) = mask.dimensions();
    let r = kernel / 2;
    let mut out = mask.clone();
    if w <= 2 * r || h <= 2 * r {
        return Ok(out);
    }

    for y in r..h - r {
        for x in r..w - r {
            let mut count = 0usize;
            for ny in y - r..=y + r {
                for nx in x - r..=x + r {
                    if mask.get_pixel(nx, ny)[0] > INCLUDED_LEVEL {
                        count += 1;
                    }
                }
            }
            if count < CLEAN_MIN_NEIGHBORS {
                out.put_pixel(x, y, Luma([0]));
            }
        }
    }

    Ok(out)
}

/// Grow included regions by `radius` pixels (Euclidean). Soft values already above
/// the grown area are kept.
pub fn dilate_mask(mask: &GrayImage, radius: f32) -> GrayImage {
    if radius <= 0.0 {
        return mask.clone();
    }
    let binary = ip_threshold(mask, INCLUDED_LEVEL, ThresholdType::Binary);
    let d2 = euclidean_squared_distance_transform(&binary);
    let r2 = f64::from(radius) * f64::from(radius);

    let mut out = mask.clone();
    for (out_px, d2_px) in out.pixels_mut().zip(d2.pixels()) {
        if d2_px[0] <= r2 {
            *out_px = Luma([255]);
        }
    }
    out
}

/// Soften mask edges with a gaussian blur. Non-positive sigma is a no-op.
pub fn feather_mask(mask: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 || mask.width() == 0 || mask.height() == 0 {
        return mask.clone();
    }
    gaussian_blur_f32(mask, sigma)
}
