pub mod buffer;
pub mod collaborator;
pub mod composite;
pub mod config;
pub mod editor;
pub mod error;
pub mod inference;
pub mod mask;
pub mod pipeline;
pub mod refine;
pub mod resample;

pub use buffer::{LabelBuffer, NO_SUBJECT};
pub use collaborator::{Collaborator, NoSegmenter, Segmenter, Stylizer};
pub use composite::{CompositeRequest, composite, mask_preview};
pub use config::{MaskProcessingOptions, PipelineSettings, SegmenterSettings, StylizerSettings};
pub use editor::{BrushMode, EditSession, StrokeSummary};
pub use error::{StyleMaskError, StyleMaskResult};
pub use inference::{OnnxSegmenter, OnnxStylizer};
pub use mask::MaskOrigin;
pub use pipeline::{
    OutputState, PipelineState, PipelineWarning, Recompute, StylePipeline, StylizeDisposition,
    StylizeJob, StylizeOutcome,
};
pub use refine::MaskOperation;

/// Environment variable holding the default segmentation model path.
pub const ENV_SEGMENTATION_MODEL: &str = "STYLEMASK_SEGMENTATION_MODEL";
/// Environment variable holding the default style-transfer model path.
pub const ENV_STYLE_MODEL: &str = "STYLEMASK_STYLE_MODEL";

/// Build a pipeline backed by ONNX models.
///
/// A model that is not configured or fails to load leaves its collaborator
/// unavailable; the pipeline itself is always constructed.
pub fn onnx_pipeline(
    settings: PipelineSettings,
    segmenter: Option<SegmenterSettings>,
    stylizer: Option<StylizerSettings>,
) -> StylePipeline<OnnxSegmenter, OnnxStylizer> {
    let segmenter = match segmenter {
        Some(settings) => Collaborator::from_result(OnnxSegmenter::load(settings)),
        None => Collaborator::unavailable("no segmentation model configured"),
    };
    let stylizer = match stylizer {
        Some(settings) => Collaborator::from_result(OnnxStylizer::load(settings)),
        None => Collaborator::unavailable("no style model configured"),
    };
    StylePipeline::new(settings, segmenter, stylizer)
}
