use image::imageops::{self, FilterType};
use image::{GrayImage, RgbaImage};

use crate::StyleMaskResult;
use crate::buffer::ensure_non_empty;

/// Resize an RGBA buffer to exactly `width x height`. Same-size input is returned as a copy.
pub fn resample_rgba(
    source: &RgbaImage,
    width: u32,
    height: u32,
    filter: FilterType,
) -> StyleMaskResult<RgbaImage> {
    ensure_non_empty(width, height)?;
    if source.dimensions() == (width, height) {
        return Ok(source.clone());
    }
    ensure_non_empty(source.width(), source.height())?;
    tracing::debug!(
        from = ?source.dimensions(),
        to = ?(width, height),
        ?filter,
        "resampling rgba buffer"
    );
    Ok(imageops::resize(source, width, height, filter))
}

/// Resize a mask to exactly `width x height`. Same-size input is returned as a copy.
pub fn resample_mask(
    mask: &GrayImage,
    width: u32,
    height: u32,
    filter: FilterType,
) -> StyleMaskResult<GrayImage> {
    ensure_non_empty(width, height)?;
    if mask.dimensions() == (width, height) {
        return Ok(mask.clone());
    }
    ensure_non_empty(mask.width(), mask.height())?;
    tracing::debug!(
        from = ?mask.dimensions(),
        to = ?(width, height),
        ?filter,
        "resampling mask"
    );
    Ok(imageops::resize(mask, width, height, filter))
}
