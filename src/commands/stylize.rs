use stylemask::buffer::load_rgba;
use stylemask::{
    Collaborator, OnnxStylizer, OutputState, StyleMaskError, StyleMaskResult, StylePipeline,
};

use crate::cli::{GlobalOptions, StylizeCommand};
use crate::report::report_warnings;

use super::utils::{
    build_settings, derive_variant_path, resolve_export_path, runtime, segmenter_handle,
    stylizer_settings,
};

/// Run the stylize command.
pub fn run(global: &GlobalOptions, cmd: StylizeCommand) -> StyleMaskResult<()> {
    let content = load_rgba(&cmd.content)?;
    let style = load_rgba(&cmd.style)?;
    let stylizer = OnnxStylizer::load(stylizer_settings(global, &cmd))?;

    let mut pipeline = StylePipeline::new(
        build_settings(global, &cmd.mask_processing),
        segmenter_handle(global),
        Collaborator::ready(stylizer),
    );
    let runtime = runtime()?;
    runtime.block_on(pipeline.load_content(content))?;
    pipeline.set_masking(!cmd.no_mask)?;
    pipeline.set_strength(cmd.strength)?;
    report_warnings(&pipeline.take_warnings());

    runtime.block_on(pipeline.select_style(style))?;
    let OutputState::Ready(output) = pipeline.output() else {
        return Err(StyleMaskError::StylizeFailed(
            "no output was produced".to_string(),
        ));
    };

    let output_path = cmd
        .output
        .clone()
        .unwrap_or_else(|| derive_variant_path(&cmd.content, "stylized", "png"));
    output.save(&output_path)?;
    println!("Stylized PNG saved to {}", output_path.display());

    if let (Some(path), Some(mask)) = (
        resolve_export_path(&cmd.export_mask, &cmd.content, "mask"),
        pipeline.mask(),
    ) {
        mask.save(&path)?;
        println!("Mask PNG saved to {}", path.display());
    }

    if let (Some(path), Some(stylized)) = (
        resolve_export_path(&cmd.export_stylized, &cmd.content, "raw-stylized"),
        pipeline.stylized(),
    ) {
        stylized.save(&path)?;
        println!("Raw stylized PNG saved to {}", path.display());
    }

    Ok(())
}
