use stylemask::buffer::{is_mask_empty, load_mask, load_rgba};
use stylemask::refine::{apply_operations, operations_from_options};
use stylemask::resample::{resample_mask, resample_rgba};
use stylemask::{CompositeRequest, StyleMaskResult, composite};

use crate::cli::{CompositeCommand, GlobalOptions};

use super::utils::{build_settings, derive_variant_path};

/// Run the composite command.
pub fn run(global: &GlobalOptions, cmd: CompositeCommand) -> StyleMaskResult<()> {
    let settings = build_settings(global, &cmd.mask_processing);
    let content = load_rgba(&cmd.content)?;
    let (w, h) = content.dimensions();
    let stylized = resample_rgba(
        &load_rgba(&cmd.stylized)?,
        w,
        h,
        settings.stylized_resize_filter,
    )?;

    let mask = match &cmd.mask {
        Some(path) => {
            let operations = operations_from_options(&settings.mask_processing);
            let processed = apply_operations(&load_mask(path)?, &operations)?;
            if is_mask_empty(&processed) {
                tracing::warn!(path = %path.display(), "mask has no included pixels");
            }
            Some(resample_mask(&processed, w, h, settings.mask_resize_filter)?)
        }
        None => None,
    };

    let mut request = CompositeRequest::new(&content, &stylized, cmd.strength);
    if let Some(mask) = mask.as_ref() {
        request = request.with_mask(mask);
    }
    let output = composite(&request)?;

    let output_path = cmd
        .output
        .clone()
        .unwrap_or_else(|| derive_variant_path(&cmd.content, "composite", "png"));
    output.save(&output_path)?;
    println!("Composite PNG saved to {}", output_path.display());

    Ok(())
}
