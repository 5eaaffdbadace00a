use std::path::Path;
use std::sync::{Arc, Mutex};

use image::imageops::FilterType;
use image::{Rgba, RgbaImage};
use ndarray::Array4;
use ort::session::Session;
use ort::value::{DynValue, Tensor};

use crate::buffer::{LabelBuffer, NO_SUBJECT};
use crate::collaborator::{Segmenter, Stylizer};
use crate::config::{SegmenterSettings, StylizerSettings};
use crate::{StyleMaskError, StyleMaskResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    Nchw,
    Nhwc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelInputSpec {
    pub width: usize,
    pub height: usize,
    pub layout: ChannelLayout,
}

/// How pixel values are mapped into the input tensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Normalization {
    /// Scale to 0..1, then subtract the ImageNet mean and divide by its std.
    ImageNet,
    /// Divide by the given value (255.0 gives 0..1).
    Scale(f32),
}

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Resize the image to the model input and pack its RGB channels into a batch of one.
/// Alpha is dropped.
pub fn image_to_array(
    rgba: &RgbaImage,
    spec: ModelInputSpec,
    filter: FilterType,
    normalization: Normalization,
) -> StyleMaskResult<Array4<f32>> {
    let target_w = u32::try_from(spec.width).map_err(|_| {
        StyleMaskError::UnexpectedOutput(format!("model width {} exceeds u32", spec.width))
    })?;
    let target_h = u32::try_from(spec.height).map_err(|_| {
        StyleMaskError::UnexpectedOutput(format!("model height {} exceeds u32", spec.height))
    })?;
    crate::buffer::ensure_non_empty(target_w, target_h)?;
    crate::buffer::ensure_non_empty(rgba.width(), rgba.height())?;

    let resized = if rgba.dimensions() == (target_w, target_h) {
        rgba.clone()
    } else {
        image::imageops::resize(rgba, target_w, target_h, filter)
    };
    let (w, h) = (spec.width, spec.height);

    let normalize = |value: u8, channel: usize| -> f32 {
        match normalization {
            Normalization::ImageNet => {
                (f32::from(value) / 255.0 - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel]
            }
            Normalization::Scale(scale) => f32::from(value) / scale,
        }
    };

    let mut array = match spec.layout {
        ChannelLayout::Nchw => Array4::<f32>::zeros((1, 3, h, w)),
        ChannelLayout::Nhwc => Array4::<f32>::zeros((1, h, w, 3)),
    };
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            let value = normalize(pixel[c], c);
            match spec.layout {
                ChannelLayout::Nchw => array[[0, c, y, x]] = value,
                ChannelLayout::Nhwc => array[[0, y, x, c]] = value,
            }
        }
    }
    Ok(array)
}

/// Drop a leading batch axis of size one, if present.
fn strip_batch(dims: &[usize]) -> &[usize] {
    match dims {
        [1, rest @ ..] if rest.len() == 3 => rest,
        _ => dims,
    }
}

/// Work out whether a 3-channel image tensor is channel-first or channel-last.
/// Returns the layout plus `(height, width)`.
pub fn image_layout_of(dims: &[usize]) -> Option<(ChannelLayout, usize, usize)> {
    match strip_batch(dims) {
        [3, h, w] if *h > 0 && *w > 0 => Some((ChannelLayout::Nchw, *h, *w)),
        [h, w, 3] if *h > 0 && *w > 0 => Some((ChannelLayout::Nhwc, *h, *w)),
        _ => None,
    }
}

/// Argmax over the class axis of `[1, C, H, W]` (or `[C, H, W]`) logits.
/// The background class becomes [`NO_SUBJECT`]; every other class keeps its index.
pub fn argmax_labels(
    logits: &[f32],
    dims: &[usize],
    background_class: usize,
) -> StyleMaskResult<LabelBuffer> {
    let &[classes, h, w] = strip_batch(dims) else {
        return Err(StyleMaskError::UnexpectedOutput(format!(
            "segmentation output shape {dims:?} is not [1, C, H, W]"
        )));
    };
    let plane = h * w;
    if classes == 0 || logits.len() != classes * plane {
        return Err(StyleMaskError::UnexpectedOutput(format!(
            "segmentation output has {} values for shape {dims:?}",
            logits.len()
        )));
    }

    let mut labels = Vec::with_capacity(plane);
    for idx in 0..plane {
        let mut best_class = 0usize;
        let mut best = f32::NEG_INFINITY;
        for class in 0..classes {
            let value = logits[class * plane + idx];
            if value > best {
                best = value;
                best_class = class;
            }
        }
        let label = if best_class == background_class {
            NO_SUBJECT
        } else {
            i32::try_from(best_class).unwrap_or(i32::MAX)
        };
        labels.push(label);
    }

    LabelBuffer::new(w as u32, h as u32, labels)
}

/// Turn a 3-channel float image tensor into an opaque RGBA buffer.
/// Values are multiplied by `scale`, rounded and clamped.
pub fn tensor_to_rgba(data: &[f32], dims: &[usize], scale: f32) -> StyleMaskResult<RgbaImage> {
    let (layout, h, w) = image_layout_of(dims).ok_or_else(|| {
        StyleMaskError::UnexpectedOutput(format!(
            "stylized output shape {dims:?} is neither [1, 3, H, W] nor [1, H, W, 3]"
        ))
    })?;
    if data.len() != 3 * h * w {
        return Err(StyleMaskError::UnexpectedOutput(format!(
            "stylized output has {} values for shape {dims:?}",
            data.len()
        )));
    }

    let to_u8 = |value: f32| (value * scale).round().clamp(0.0, 255.0) as u8;
    let plane = h * w;
    Ok(RgbaImage::from_fn(w as u32, h as u32, |x, y| {
        let idx = y as usize * w + x as usize;
        let channel = |c: usize| match layout {
            ChannelLayout::Nchw => data[c * plane + idx],
            ChannelLayout::Nhwc => data[idx * 3 + c],
        };
        Rgba([to_u8(channel(0)), to_u8(channel(1)), to_u8(channel(2)), 255])
    }))
}

/// Load an ONNX session, checking the file exists first.
fn open_session(model_path: &Path, intra_threads: Option<usize>) -> StyleMaskResult<Session> {
    if !model_path.exists() {
        return Err(StyleMaskError::ModelNotFound {
            path: model_path.to_path_buf(),
        });
    }
    let mut builder = Session::builder().map_err(|e| load_error(model_path, e))?;
    if let Some(threads) = intra_threads {
        builder = builder
            .with_intra_threads(threads)
            .map_err(|e| load_error(model_path, e))?;
    }
    let session = builder
        .commit_from_file(model_path)
        .map_err(|e| load_error(model_path, e))?;
    tracing::info!(path = %model_path.display(), "model loaded");
    Ok(session)
}

fn load_error(model_path: &Path, err: impl std::fmt::Display) -> StyleMaskError {
    StyleMaskError::CollaboratorUnavailable(format!("failed to load {}: {err}", model_path.display()))
}

/// Copy a float output tensor out as `(dims, values)`.
fn extract_f32(value: &DynValue) -> StyleMaskResult<(Vec<usize>, Vec<f32>)> {
    let (shape, data) = value.try_extract_tensor::<f32>()?;
    let dims = shape
        .iter()
        .map(|&d| usize::try_from(d).unwrap_or(0))
        .collect();
    Ok((dims, data.to_vec()))
}

/// Run blocking model work on the runtime's blocking pool and await it.
///
/// The awaiting task stays cancellable, so a timeout around it fires on time; the
/// abandoned work still finishes in the background. A panic in `work` is reported
/// through `on_panic`.
pub(crate) async fn run_blocking<R, F>(
    work: F,
    on_panic: fn(String) -> StyleMaskError,
) -> StyleMaskResult<R>
where
    F: FnOnce() -> StyleMaskResult<R> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| on_panic(format!("inference task failed: {err}")))?
}

/// Human-parsing segmentation backed by an ONNX model.
#[derive(Clone)]
pub struct OnnxSegmenter {
    session: Arc<Mutex<Session>>,
    settings: SegmenterSettings,
}

impl OnnxSegmenter {
    pub fn load(settings: SegmenterSettings) -> StyleMaskResult<Self> {
        let session = open_session(&settings.model_path, settings.intra_threads)?;
        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            settings,
        })
    }

    fn run(&self, content: &RgbaImage) -> StyleMaskResult<Option<LabelBuffer>> {
        let _span = tracing::debug_span!("segment").entered();
        let array = image_to_array(
            content,
            self.settings.input_spec,
            self.settings.input_resize_filter,
            Normalization::ImageNet,
        )?;
        let input = Tensor::from_array(array)?;

        let mut session = self.session.lock().map_err(|_| {
            StyleMaskError::CollaboratorUnavailable("segmentation session poisoned".into())
        })?;
        let outputs = session.run(ort::inputs![input])?;
        let (dims, logits) = extract_f32(&outputs[0])?;

        let labels = argmax_labels(&logits, &dims, self.settings.background_class)?;
        tracing::debug!(dims = ?labels.dimensions(), "segmentation labels ready");
        if labels.is_empty() {
            return Ok(None);
        }
        Ok(Some(labels))
    }
}

impl Segmenter for OnnxSegmenter {
    async fn segment(&self, content: &RgbaImage) -> StyleMaskResult<Option<LabelBuffer>> {
        let worker = self.clone();
        let content = content.clone();
        run_blocking(
            move || worker.run(&content),
            StyleMaskError::CollaboratorUnavailable,
        )
        .await
    }
}

/// Arbitrary style transfer backed by an ONNX model taking `(content, style)` inputs.
#[derive(Clone)]
pub struct OnnxStylizer {
    session: Arc<Mutex<Session>>,
    settings: StylizerSettings,
}

impl OnnxStylizer {
    pub fn load(settings: StylizerSettings) -> StyleMaskResult<Self> {
        let session = open_session(&settings.model_path, settings.intra_threads)?;
        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            settings,
        })
    }

    fn run(&self, content: &RgbaImage, style: &RgbaImage) -> StyleMaskResult<RgbaImage> {
        let _span = tracing::debug_span!("stylize").entered();
        let scale = self.settings.value_scale;
        let filter = self.settings.input_resize_filter;
        let content_array = image_to_array(
            content,
            self.settings.content_spec,
            filter,
            Normalization::Scale(scale),
        )?;
        let style_array = image_to_array(
            style,
            self.settings.style_spec,
            filter,
            Normalization::Scale(scale),
        )?;
        let content_input = Tensor::from_array(content_array)?;
        let style_input = Tensor::from_array(style_array)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| StyleMaskError::StylizeFailed("style session poisoned".into()))?;
        let outputs = session.run(ort::inputs![content_input, style_input])?;
        let (dims, values) = extract_f32(&outputs[0])?;
        tensor_to_rgba(&values, &dims, scale)
    }
}

impl Stylizer for OnnxStylizer {
    async fn stylize(&self, content: &RgbaImage, style: &RgbaImage) -> StyleMaskResult<RgbaImage> {
        let worker = self.clone();
        let (content, style) = (content.clone(), style.clone());
        run_blocking(
            move || worker.run(&content, &style),
            StyleMaskError::StylizeFailed,
        )
        .await
    }
}
