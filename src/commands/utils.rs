use std::path::{Path, PathBuf};
use std::time::Duration;

use stylemask::inference::{ChannelLayout, ModelInputSpec};
use stylemask::{
    Collaborator, MaskProcessingOptions, OnnxSegmenter, PipelineSettings, SegmenterSettings,
    StyleMaskResult, StylizerSettings,
};
use tokio::runtime::{Builder, Runtime};

use crate::cli::{GlobalOptions, MaskProcessingArgs, StylizeCommand};

/// Build pipeline settings from the global and mask processing options.
pub fn build_settings(global: &GlobalOptions, mask_args: &MaskProcessingArgs) -> PipelineSettings {
    let mask_processing: MaskProcessingOptions = mask_args.into();
    let timeout = match global.segmentation_timeout_ms {
        0 => None,
        ms => Some(Duration::from_millis(ms)),
    };
    PipelineSettings::default()
        .with_included_labels(global.labels.iter().copied())
        .with_segmentation_timeout(timeout)
        .with_mask_filter(global.mask_filter.into())
        .with_stylized_filter(global.stylized_filter.into())
        .with_mask_processing(mask_processing)
}

/// Segmenter settings, if a segmentation model was given.
pub fn segmenter_settings(global: &GlobalOptions) -> Option<SegmenterSettings> {
    let path = global.segmentation_model.as_ref()?;
    let spec = ModelInputSpec {
        width: global.segmentation_size,
        height: global.segmentation_size,
        layout: ChannelLayout::Nchw,
    };
    Some(
        SegmenterSettings::new(path)
            .with_input_spec(spec)
            .with_intra_threads(global.intra_threads),
    )
}

/// Load the segmentation model if one was given. Failures leave it unavailable.
pub fn segmenter_handle(global: &GlobalOptions) -> Collaborator<OnnxSegmenter> {
    match segmenter_settings(global) {
        Some(settings) => Collaborator::from_result(OnnxSegmenter::load(settings)),
        None => Collaborator::unavailable("no segmentation model configured"),
    }
}

/// Stylizer settings for the stylize command.
pub fn stylizer_settings(global: &GlobalOptions, cmd: &StylizeCommand) -> StylizerSettings {
    let spec = |size: usize| ModelInputSpec {
        width: size,
        height: size,
        layout: cmd.layout.into(),
    };
    StylizerSettings::new(&cmd.style_model)
        .with_input_specs(spec(cmd.content_size), spec(cmd.style_size))
        .with_value_scale(cmd.value_scale)
        .with_intra_threads(global.intra_threads)
}

/// Single-threaded runtime driving the pipeline's async steps.
pub fn runtime() -> StyleMaskResult<Runtime> {
    Ok(Builder::new_current_thread().enable_time().build()?)
}

/// Derive a variant file path by appending a suffix before the extension.
pub fn derive_variant_path(input: &Path, suffix: &str, extension: &str) -> PathBuf {
    let mut derived = input.to_path_buf();
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| suffix.to_string());
    let filename = format!("{}-{}.{}", stem, suffix, extension);
    derived.set_file_name(filename);
    derived
}

/// Resolve an optional export flag: an explicit path, a derived one, or none.
pub fn resolve_export_path(
    flag: &Option<Option<PathBuf>>,
    input: &Path,
    suffix: &str,
) -> Option<PathBuf> {
    match flag {
        Some(Some(path)) => Some(path.clone()),
        Some(None) => Some(derive_variant_path(input, suffix, "png")),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_path_keeps_directory() {
        let path = derive_variant_path(Path::new("shots/coat.jpg"), "mask", "png");
        assert_eq!(path, PathBuf::from("shots/coat-mask.png"));
    }

    #[test]
    fn export_path_resolution() {
        let input = Path::new("coat.png");
        assert_eq!(resolve_export_path(&None, input, "mask"), None);
        assert_eq!(
            resolve_export_path(&Some(None), input, "mask"),
            Some(PathBuf::from("coat-mask.png"))
        );
        assert_eq!(
            resolve_export_path(&Some(Some(PathBuf::from("out.png"))), input, "mask"),
            Some(PathBuf::from("out.png"))
        );
    }
}
