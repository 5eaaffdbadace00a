//! The orchestrator: sequences segmentation, editing, stylization and compositing
//! for one content image at a time.
//!
//! Stylization runs as a detached [`StylizeJob`] so the mask can keep being edited
//! while the model works. Every job carries the epoch it was issued under; a result
//! that comes back after a newer job or a new content image is dropped.

use std::fmt;
use std::sync::Arc;

use image::{GrayImage, RgbaImage};

use crate::buffer::{LabelBuffer, ensure_non_empty, is_mask_empty, mask_coverage};
use crate::collaborator::{Collaborator, Segmenter, Stylizer};
use crate::composite::{CompositeRequest, clamp_strength, composite};
use crate::config::PipelineSettings;
use crate::editor::{BrushMode, EditSession};
use crate::mask::{MaskOrigin, build_label_mask, heuristic_mask};
use crate::refine::{apply_operations, operations_from_options};
use crate::resample::{resample_mask, resample_rgba};
use crate::{StyleMaskError, StyleMaskResult};

/// Where the pipeline is for the current content image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    ContentLoaded,
    MaskReady,
    Stylizing,
    Composited,
}

/// Non-fatal conditions worth telling the user about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineWarning {
    /// Segmentation was unavailable, failed, timed out or found nothing; the
    /// heuristic mask is in use.
    SegmentationFallback { reason: String },
    /// The mask has no included pixel; manual editing is the way forward.
    EmptyMask { origin: MaskOrigin },
}

impl fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineWarning::SegmentationFallback { reason } => {
                write!(f, "using heuristic mask ({reason})")
            }
            PipelineWarning::EmptyMask { origin } => {
                write!(f, "{}", StyleMaskError::EmptyMask { origin: origin.as_str() })
            }
        }
    }
}

/// What the pipeline shows right now.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputState<'a> {
    Ready(&'a RgbaImage),
    /// A stylization is in flight; `previous` is the last good output, if any.
    Pending { previous: Option<&'a RgbaImage> },
    /// The last stylization failed; `previous` is kept on screen, if any.
    Failed {
        message: &'a str,
        previous: Option<&'a RgbaImage>,
    },
    Empty,
}

/// A style-transfer call detached from the pipeline.
pub struct StylizeJob<T> {
    epoch: u64,
    content: Arc<RgbaImage>,
    style: Arc<RgbaImage>,
    stylizer: Arc<Collaborator<T>>,
}

impl<T> fmt::Debug for StylizeJob<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StylizeJob")
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

impl<T: Stylizer> StylizeJob<T> {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Call the style-transfer model. Hand the outcome to [`StylePipeline::finish_stylize`].
    pub async fn run(self) -> StylizeOutcome {
        let result = match self.stylizer.as_ref() {
            Collaborator::Ready(stylizer) => stylizer.stylize(&self.content, &self.style).await,
            Collaborator::Unavailable { reason } => Err(StyleMaskError::StylizeFailed(format!(
                "style model unavailable: {reason}"
            ))),
        };
        StylizeOutcome {
            epoch: self.epoch,
            result,
        }
    }
}

/// Result of a [`StylizeJob`], tagged with its epoch.
#[derive(Debug)]
pub struct StylizeOutcome {
    pub epoch: u64,
    pub result: StyleMaskResult<RgbaImage>,
}

/// What happened to a finished stylization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StylizeDisposition {
    /// The result was cached and composited.
    Applied,
    /// A newer request superseded it.
    Discarded { epoch: u64, current: u64 },
}

/// What a mask edit, strength change or masking toggle led to.
pub enum Recompute<T> {
    /// The cached stylized image was recomposited immediately.
    Composited,
    /// No stylized image is cached; run this job and finish it.
    Restylize(StylizeJob<T>),
    /// A stylization is in flight and will pick up the change when it lands.
    Deferred,
    /// Nothing to composite yet.
    Idle,
}

impl<T> fmt::Debug for Recompute<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recompute::Composited => f.write_str("Composited"),
            Recompute::Restylize(job) => f.debug_tuple("Restylize").field(job).finish(),
            Recompute::Deferred => f.write_str("Deferred"),
            Recompute::Idle => f.write_str("Idle"),
        }
    }
}

/// Who holds the mask.
#[derive(Debug)]
enum MaskSlot {
    Absent,
    Owned(GrayImage),
    Editing(EditSession),
}

impl MaskSlot {
    fn mask(&self) -> Option<&GrayImage> {
        match self {
            MaskSlot::Absent => None,
            MaskSlot::Owned(mask) => Some(mask),
            MaskSlot::Editing(session) => Some(session.mask()),
        }
    }
}

/// Long-lived orchestrator for one image session at a time.
pub struct StylePipeline<S, T> {
    settings: PipelineSettings,
    segmenter: Collaborator<S>,
    stylizer: Arc<Collaborator<T>>,
    state: PipelineState,
    epoch: u64,
    in_flight: Option<u64>,
    content: Option<Arc<RgbaImage>>,
    mask: MaskSlot,
    mask_origin: Option<MaskOrigin>,
    style: Option<Arc<RgbaImage>>,
    stylized: Option<RgbaImage>,
    output: Option<RgbaImage>,
    last_error: Option<String>,
    strength: f32,
    masking: bool,
    warnings: Vec<PipelineWarning>,
}

impl<S, T> StylePipeline<S, T>
where
    S: Segmenter,
    T: Stylizer,
{
    pub fn new(
        settings: PipelineSettings,
        segmenter: Collaborator<S>,
        stylizer: Collaborator<T>,
    ) -> Self {
        if let Some(reason) = segmenter.unavailable_reason() {
            tracing::info!(%reason, "segmentation unavailable, heuristic masks only");
        }
        let strength = clamp_strength(settings.initial_strength);
        Self {
            settings,
            segmenter,
            stylizer: Arc::new(stylizer),
            state: PipelineState::Idle,
            epoch: 0,
            in_flight: None,
            content: None,
            mask: MaskSlot::Absent,
            mask_origin: None,
            style: None,
            stylized: None,
            output: None,
            last_error: None,
            strength,
            masking: true,
            warnings: Vec::new(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn content(&self) -> Option<&RgbaImage> {
        self.content.as_deref()
    }

    /// The current mask, whether or not the editor holds it.
    pub fn mask(&self) -> Option<&GrayImage> {
        self.mask.mask()
    }

    pub fn mask_origin(&self) -> Option<MaskOrigin> {
        self.mask_origin
    }

    /// The stylized image, already aligned to the content size.
    pub fn stylized(&self) -> Option<&RgbaImage> {
        self.stylized.as_ref()
    }

    pub fn strength(&self) -> f32 {
        self.strength
    }

    pub fn masking(&self) -> bool {
        self.masking
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.mask, MaskSlot::Editing(_))
    }

    /// Warnings gathered since the last call.
    pub fn take_warnings(&mut self) -> Vec<PipelineWarning> {
        std::mem::take(&mut self.warnings)
    }

    pub fn output(&self) -> OutputState<'_> {
        let previous = self.output.as_ref();
        if self.state == PipelineState::Stylizing {
            return OutputState::Pending { previous };
        }
        if let Some(message) = self.last_error.as_deref() {
            return OutputState::Failed { message, previous };
        }
        match previous {
            Some(output) => OutputState::Ready(output),
            None => OutputState::Empty,
        }
    }

    fn transition(&mut self, next: PipelineState) {
        if self.state != next {
            tracing::info!(from = ?self.state, to = ?next, epoch = self.epoch, "pipeline state");
            self.state = next;
        }
    }

    fn warn(&mut self, warning: PipelineWarning) {
        tracing::warn!(%warning, "pipeline warning");
        self.warnings.push(warning);
    }

    /// Start a new image session: reset everything, then build the initial mask.
    ///
    /// Segmentation problems never fail this call; they fall back to the heuristic mask
    /// and leave a [`PipelineWarning`].
    pub async fn load_content(&mut self, image: RgbaImage) -> StyleMaskResult<()> {
        self.epoch += 1;
        self.in_flight = None;
        self.content = None;
        self.mask = MaskSlot::Absent;
        self.mask_origin = None;
        self.style = None;
        self.stylized = None;
        self.output = None;
        self.last_error = None;
        self.transition(PipelineState::Idle);

        let (w, h) = image.dimensions();
        ensure_non_empty(w, h)?;
        let content = Arc::new(image);
        self.content = Some(Arc::clone(&content));
        self.transition(PipelineState::ContentLoaded);

        let (mask, origin) = match self.segment(&content).await {
            Ok(labels) => {
                let mask = build_label_mask(&labels, &self.settings.included_labels);
                let mask = resample_mask(&mask, w, h, self.settings.mask_resize_filter)?;
                (mask, MaskOrigin::Segmentation)
            }
            Err(reason) => {
                self.warn(PipelineWarning::SegmentationFallback { reason });
                (heuristic_mask(&content), MaskOrigin::Heuristic)
            }
        };

        if is_mask_empty(&mask) {
            self.warn(PipelineWarning::EmptyMask { origin });
        }
        tracing::debug!(%origin, coverage = mask_coverage(&mask), "mask ready");
        self.mask = MaskSlot::Owned(mask);
        self.mask_origin = Some(origin);
        self.transition(PipelineState::MaskReady);
        Ok(())
    }

    /// Ask the segmentation model for labels; any reason to fall back comes back as `Err`.
    async fn segment(&self, content: &RgbaImage) -> Result<LabelBuffer, String> {
        let segmenter = match &self.segmenter {
            Collaborator::Ready(segmenter) => segmenter,
            Collaborator::Unavailable { reason } => {
                return Err(StyleMaskError::CollaboratorUnavailable(reason.clone()).to_string());
            }
        };

        let call = segmenter.segment(content);
        let result = match self.settings.segmentation_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(StyleMaskError::Timeout(limit)),
            },
            None => call.await,
        };

        match result {
            Ok(Some(labels)) if !labels.is_empty() => Ok(labels),
            Ok(_) => Err("no subject detected".to_string()),
            Err(err) => Err(err.to_string()),
        }
    }

    /// Issue a stylization for `style` against the current content.
    ///
    /// The returned job is independent of the pipeline; run it and pass the outcome to
    /// [`finish_stylize`](Self::finish_stylize). Issuing a job supersedes every earlier one.
    pub fn begin_stylize(&mut self, style: RgbaImage) -> StyleMaskResult<StylizeJob<T>> {
        self.style = Some(Arc::new(style));
        self.issue_job()
    }

    fn issue_job(&mut self) -> StyleMaskResult<StylizeJob<T>> {
        let content = self.content.clone().ok_or(StyleMaskError::NoContent)?;
        let style = self.style.clone().ok_or_else(|| {
            StyleMaskError::StylizeFailed("no style image selected".to_string())
        })?;

        self.epoch += 1;
        self.in_flight = Some(self.epoch);
        self.stylized = None;
        self.transition(PipelineState::Stylizing);
        tracing::debug!(epoch = self.epoch, "stylization issued");

        Ok(StylizeJob {
            epoch: self.epoch,
            content,
            style,
            stylizer: Arc::clone(&self.stylizer),
        })
    }

    /// Apply a finished stylization, unless a newer request superseded it.
    ///
    /// A failure is returned as [`StyleMaskError::StylizeFailed`]; the previous output
    /// stays available and the pipeline goes back to `MaskReady`.
    pub fn finish_stylize(&mut self, outcome: StylizeOutcome) -> StyleMaskResult<StylizeDisposition> {
        if self.in_flight != Some(outcome.epoch) {
            let current = self.epoch;
            tracing::warn!(epoch = outcome.epoch, current, "discarding superseded stylization");
            return Ok(StylizeDisposition::Discarded {
                epoch: outcome.epoch,
                current,
            });
        }
        self.in_flight = None;

        let aligned = outcome.result.and_then(|stylized| {
            let (w, h) = self
                .content
                .as_deref()
                .map(RgbaImage::dimensions)
                .ok_or(StyleMaskError::NoContent)?;
            resample_rgba(&stylized, w, h, self.settings.stylized_resize_filter)
        });

        match aligned {
            Ok(stylized) => {
                self.stylized = Some(stylized);
                self.last_error = None;
                self.recomposite()?;
                Ok(StylizeDisposition::Applied)
            }
            Err(err) => {
                let message = match err {
                    StyleMaskError::StylizeFailed(message) => message,
                    other => other.to_string(),
                };
                tracing::warn!(%message, "stylization failed");
                self.last_error = Some(message.clone());
                self.transition(PipelineState::MaskReady);
                Err(StyleMaskError::StylizeFailed(message))
            }
        }
    }

    /// Select a style and wait for the result in one go.
    pub async fn select_style(&mut self, style: RgbaImage) -> StyleMaskResult<StylizeDisposition> {
        let job = self.begin_stylize(style)?;
        let outcome = job.run().await;
        self.finish_stylize(outcome)
    }

    /// Set the blend strength (clamped into [0, 1]) and recompute.
    pub fn set_strength(&mut self, strength: f32) -> StyleMaskResult<Recompute<T>> {
        self.strength = clamp_strength(strength);
        self.request_recompute()
    }

    /// Turn masking on or off. Off cross-fades the whole image by the strength.
    pub fn set_masking(&mut self, enabled: bool) -> StyleMaskResult<Recompute<T>> {
        self.masking = enabled;
        self.request_recompute()
    }

    fn request_recompute(&mut self) -> StyleMaskResult<Recompute<T>> {
        if self.content.is_none() {
            return Ok(Recompute::Idle);
        }
        if self.stylized.is_some() {
            self.recomposite()?;
            return Ok(Recompute::Composited);
        }
        if self.in_flight.is_some() {
            return Ok(Recompute::Deferred);
        }
        if self.style.is_some() {
            return self.issue_job().map(Recompute::Restylize);
        }
        Ok(Recompute::Idle)
    }

    /// Clean and align the mask, then blend the cached stylized image into the content.
    fn recomposite(&mut self) -> StyleMaskResult<()> {
        let (Some(content), Some(stylized)) = (self.content.as_deref(), self.stylized.as_ref())
        else {
            return Ok(());
        };
        let (w, h) = content.dimensions();

        let prepared = match (self.masking, self.mask.mask()) {
            (true, Some(mask)) => {
                let operations = operations_from_options(&self.settings.mask_processing);
                let processed = apply_operations(mask, &operations)?;
                Some(resample_mask(&processed, w, h, self.settings.mask_resize_filter)?)
            }
            _ => None,
        };

        let mut request = CompositeRequest::new(content, stylized, self.strength);
        if let Some(mask) = prepared.as_ref() {
            request = request.with_mask(mask);
        }
        let output = composite(&request).inspect_err(|err| {
            if matches!(err, StyleMaskError::DimensionMismatch { .. }) {
                tracing::error!(error = %err, "compositor inputs were not aligned");
            }
        })?;

        self.output = Some(output);
        self.transition(PipelineState::Composited);
        Ok(())
    }

    /// Hand the mask to a brush editing session.
    pub fn open_editor(&mut self) -> StyleMaskResult<()> {
        if self.content.is_none() {
            return Err(StyleMaskError::NoContent);
        }
        match std::mem::replace(&mut self.mask, MaskSlot::Absent) {
            MaskSlot::Owned(mask) => {
                let session = EditSession::new(mask, self.settings.brush_radius)
                    .with_interpolation(self.settings.brush_interpolation);
                self.mask = MaskSlot::Editing(session);
                tracing::debug!("editor opened");
                Ok(())
            }
            editing @ MaskSlot::Editing(_) => {
                self.mask = editing;
                Err(StyleMaskError::EditorBusy)
            }
            MaskSlot::Absent => Err(StyleMaskError::NoContent),
        }
    }

    fn session_mut(&mut self) -> StyleMaskResult<&mut EditSession> {
        match &mut self.mask {
            MaskSlot::Editing(session) => Ok(session),
            _ => Err(StyleMaskError::EditorClosed),
        }
    }

    pub fn set_brush_mode(&mut self, mode: BrushMode) -> StyleMaskResult<()> {
        self.session_mut()?.set_mode(mode);
        Ok(())
    }

    pub fn set_brush_radius(&mut self, radius: u32) -> StyleMaskResult<()> {
        self.session_mut()?.set_radius(radius);
        Ok(())
    }

    pub fn begin_stroke(&mut self, x: i64, y: i64) -> StyleMaskResult<()> {
        self.session_mut()?.begin_stroke(x, y);
        Ok(())
    }

    pub fn continue_stroke(&mut self, x: i64, y: i64) -> StyleMaskResult<()> {
        self.session_mut()?.continue_stroke(x, y);
        Ok(())
    }

    /// Finish the current stroke and recompute with the edited mask.
    pub fn end_stroke(&mut self) -> StyleMaskResult<Recompute<T>> {
        let Some(summary) = self.session_mut()?.end_stroke() else {
            return Ok(Recompute::Idle);
        };
        tracing::debug!(
            mode = ?summary.mode,
            dabs = summary.dabs,
            changed = summary.changed_pixels,
            "stroke finished"
        );
        self.mask_origin = Some(MaskOrigin::Edited);
        self.request_recompute()
    }

    /// A single-dab stroke at `(x, y)` in the given mode.
    pub fn edit_stroke(&mut self, x: i64, y: i64, mode: BrushMode) -> StyleMaskResult<Recompute<T>> {
        let session = self.session_mut()?;
        session.end_stroke();
        session.set_mode(mode);
        session.begin_stroke(x, y);
        self.end_stroke()
    }

    /// Close the editor and take the mask back.
    pub fn close_editor(&mut self) -> StyleMaskResult<Recompute<T>> {
        let mut session = match std::mem::replace(&mut self.mask, MaskSlot::Absent) {
            MaskSlot::Editing(session) => session,
            other => {
                self.mask = other;
                return Err(StyleMaskError::EditorClosed);
            }
        };
        let unfinished = session.end_stroke().is_some();
        let mask = session.into_mask();
        if is_mask_empty(&mask) {
            self.warn(PipelineWarning::EmptyMask {
                origin: MaskOrigin::Edited,
            });
        }
        self.mask = MaskSlot::Owned(mask);
        tracing::debug!("editor closed");
        if unfinished {
            self.mask_origin = Some(MaskOrigin::Edited);
            return self.request_recompute();
        }
        Ok(Recompute::Idle)
    }
}
