use stylemask::buffer::load_rgba;
use stylemask::refine::{apply_operations, operations_from_options};
use stylemask::{StyleMaskError, StyleMaskResult, mask_preview, onnx_pipeline};

use crate::cli::{GlobalOptions, MaskCommand};
use crate::report::report_warnings;

use super::utils::{
    build_settings, derive_variant_path, resolve_export_path, runtime, segmenter_settings,
};

/// Translucent magenta laid over the included region in previews.
const PREVIEW_TINT: [u8; 4] = [255, 0, 160, 110];

/// The main function to run the mask command.
pub fn run(global: &GlobalOptions, cmd: MaskCommand) -> StyleMaskResult<()> {
    let content = load_rgba(&cmd.input)?;
    let mut pipeline = onnx_pipeline(
        build_settings(global, &cmd.mask_processing),
        segmenter_settings(global),
        None,
    );
    runtime()?.block_on(pipeline.load_content(content))?;
    report_warnings(&pipeline.take_warnings());

    let (Some(content), Some(mask)) = (pipeline.content(), pipeline.mask()) else {
        return Err(StyleMaskError::NoContent);
    };
    let mask = if cmd.processed {
        let operations = operations_from_options(&pipeline.settings().mask_processing);
        apply_operations(mask, &operations)?
    } else {
        mask.clone()
    };

    let output_path = cmd
        .output
        .clone()
        .unwrap_or_else(|| derive_variant_path(&cmd.input, "mask", "png"));
    mask.save(&output_path)?;
    if let Some(origin) = pipeline.mask_origin() {
        println!("Mask PNG ({origin}) saved to {}", output_path.display());
    }

    if let Some(path) = resolve_export_path(&cmd.preview, &cmd.input, "preview") {
        mask_preview(content, &mask, PREVIEW_TINT)?.save(&path)?;
        println!("Mask preview PNG saved to {}", path.display());
    }

    Ok(())
}
