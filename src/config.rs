use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use image::imageops::FilterType;

use crate::inference::{ChannelLayout, ModelInputSpec};

/// Garment classes of the ATR human-parsing label set: upper clothes, skirt,
/// pants, dress, belt and scarf.
pub const DEFAULT_GARMENT_LABELS: [i32; 6] = [4, 5, 6, 7, 8, 17];

/// Options for the orchestrator and the pure transforms it sequences.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Segmentation labels that count as part of the subject.
    pub included_labels: HashSet<i32>,
    /// Bound on the segmentation call before falling back to the heuristic mask.
    pub segmentation_timeout: Option<Duration>,
    /// Filter used to align masks with the content image.
    pub mask_resize_filter: FilterType,
    /// Filter used to align stylized output with the content image.
    pub stylized_resize_filter: FilterType,
    /// Post-processing applied to the mask right before compositing.
    pub mask_processing: MaskProcessingOptions,
    /// Blend strength used until the caller changes it.
    pub initial_strength: f32,
    /// Brush radius for freshly opened editor sessions.
    pub brush_radius: u32,
    /// Stamp discs along pointer segments in the editor.
    pub brush_interpolation: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            included_labels: DEFAULT_GARMENT_LABELS.into_iter().collect(),
            segmentation_timeout: Some(Duration::from_secs(5)),
            mask_resize_filter: FilterType::Triangle,
            stylized_resize_filter: FilterType::CatmullRom,
            mask_processing: MaskProcessingOptions::default(),
            initial_strength: 1.0,
            brush_radius: 12,
            brush_interpolation: false,
        }
    }
}

impl PipelineSettings {
    /// Replace the set of labels treated as subject.
    pub fn with_included_labels(mut self, labels: impl IntoIterator<Item = i32>) -> Self {
        self.included_labels = labels.into_iter().collect();
        self
    }

    /// Set or clear the segmentation timeout.
    pub fn with_segmentation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.segmentation_timeout = timeout;
        self
    }

    /// Set the filter used when resizing masks.
    pub fn with_mask_filter(mut self, filter: FilterType) -> Self {
        self.mask_resize_filter = filter;
        self
    }

    /// Set the filter used when resizing stylized buffers.
    pub fn with_stylized_filter(mut self, filter: FilterType) -> Self {
        self.stylized_resize_filter = filter;
        self
    }

    /// Set the mask post-processing options.
    pub fn with_mask_processing(mut self, options: MaskProcessingOptions) -> Self {
        self.mask_processing = options;
        self
    }

    /// Set the starting blend strength. Clamped into [0, 1].
    pub fn with_initial_strength(mut self, strength: f32) -> Self {
        self.initial_strength = crate::composite::clamp_strength(strength);
        self
    }

    /// Set the default brush radius and interpolation for editor sessions.
    pub fn with_brush(mut self, radius: u32, interpolation: bool) -> Self {
        self.brush_radius = radius.max(1);
        self.brush_interpolation = interpolation;
        self
    }
}

/// Options describing how a mask should be post-processed before compositing.
#[derive(Debug, Clone)]
pub struct MaskProcessingOptions {
    /// Odd neighbourhood size of the speck cleaner.
    pub clean_kernel: u32,
    pub threshold: Option<u8>,
    pub dilation_radius: Option<f32>,
    pub feather_sigma: Option<f32>,
}

impl Default for MaskProcessingOptions {
    fn default() -> Self {
        Self {
            clean_kernel: 3,
            threshold: None,
            dilation_radius: None,
            feather_sigma: None,
        }
    }
}

/// Options for the ONNX human-parsing model.
#[derive(Debug, Clone)]
pub struct SegmenterSettings {
    /// Path to the ONNX model file.
    pub model_path: PathBuf,
    /// Input tensor layout and size.
    pub input_spec: ModelInputSpec,
    /// Class index the model uses for "no subject".
    pub background_class: usize,
    /// Filter to use when resizing the content image for the model.
    pub input_resize_filter: FilterType,
    /// Number of intra-op threads for the inference.
    pub intra_threads: Option<usize>,
}

impl SegmenterSettings {
    /// Create new segmenter settings with default values.
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            input_spec: ModelInputSpec {
                width: 512,
                height: 512,
                layout: ChannelLayout::Nchw,
            },
            background_class: 0,
            input_resize_filter: FilterType::Triangle,
            intra_threads: None,
        }
    }

    /// Set the size and layout the model expects.
    pub fn with_input_spec(mut self, spec: ModelInputSpec) -> Self {
        self.input_spec = spec;
        self
    }

    /// Set the class index mapped to the "no subject" sentinel.
    pub fn with_background_class(mut self, class: usize) -> Self {
        self.background_class = class;
        self
    }

    /// Set the number of intra-op threads for the inference.
    pub fn with_intra_threads(mut self, intra_threads: Option<usize>) -> Self {
        self.intra_threads = intra_threads;
        self
    }
}

/// Options for the ONNX arbitrary style transfer model.
#[derive(Debug, Clone)]
pub struct StylizerSettings {
    /// Path to the ONNX model file.
    pub model_path: PathBuf,
    /// Size and layout of the content input.
    pub content_spec: ModelInputSpec,
    /// Size and layout of the style input.
    pub style_spec: ModelInputSpec,
    /// Pixel values are divided by this before being fed to the model and
    /// multiplied by it on the way out (255.0 means 0..1 tensors).
    pub value_scale: f32,
    /// Filter to use when resizing inputs for the model.
    pub input_resize_filter: FilterType,
    /// Number of intra-op threads for the inference.
    pub intra_threads: Option<usize>,
}

impl StylizerSettings {
    /// Create new stylizer settings with default values.
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            content_spec: ModelInputSpec {
                width: 384,
                height: 384,
                layout: ChannelLayout::Nhwc,
            },
            style_spec: ModelInputSpec {
                width: 256,
                height: 256,
                layout: ChannelLayout::Nhwc,
            },
            value_scale: 255.0,
            input_resize_filter: FilterType::Triangle,
            intra_threads: None,
        }
    }

    /// Set the content and style input specs.
    pub fn with_input_specs(mut self, content: ModelInputSpec, style: ModelInputSpec) -> Self {
        self.content_spec = content;
        self.style_spec = style;
        self
    }

    /// Set the pixel value scale.
    pub fn with_value_scale(mut self, scale: f32) -> Self {
        self.value_scale = scale;
        self
    }

    /// Set the number of intra-op threads for the inference.
    pub fn with_intra_threads(mut self, intra_threads: Option<usize>) -> Self {
        self.intra_threads = intra_threads;
        self
    }
}
