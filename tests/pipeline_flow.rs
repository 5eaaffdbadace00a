use std::time::Duration;

use image::{Rgba, RgbaImage};
use stylemask::{
    BrushMode, Collaborator, LabelBuffer, MaskOrigin, OutputState, PipelineSettings,
    PipelineState, PipelineWarning, Recompute, Segmenter, StyleMaskError, StyleMaskResult,
    StylePipeline, StylizeDisposition, Stylizer, onnx_pipeline,
};

/// Labels the left half of the image as garment class 5, at half resolution.
struct HalfLabels;

impl Segmenter for HalfLabels {
    async fn segment(&self, content: &RgbaImage) -> StyleMaskResult<Option<LabelBuffer>> {
        let (w, h) = (content.width() / 2, content.height() / 2);
        let labels = (0..h)
            .flat_map(|_| (0..w).map(move |x| if x < w / 2 { 5 } else { 0 }))
            .collect();
        LabelBuffer::new(w, h, labels).map(Some)
    }
}

/// Inverts the content color at a fixed low resolution, after a delay.
struct Invert {
    size: u32,
    delay: Duration,
}

impl Stylizer for Invert {
    async fn stylize(&self, content: &RgbaImage, _style: &RgbaImage) -> StyleMaskResult<RgbaImage> {
        tokio::time::sleep(self.delay).await;
        let Rgba([r, g, b, _]) = *content.get_pixel(0, 0);
        Ok(RgbaImage::from_pixel(
            self.size,
            self.size,
            Rgba([255 - r, 255 - g, 255 - b, 255]),
        ))
    }
}

const CONTENT: [u8; 4] = [40, 80, 120, 255];
const INVERTED: [u8; 4] = [215, 175, 135, 255];

fn content(w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_pixel(w, h, Rgba(CONTENT))
}

fn style() -> RgbaImage {
    RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255]))
}

fn pipeline(delay: Duration) -> StylePipeline<HalfLabels, Invert> {
    StylePipeline::new(
        PipelineSettings::default(),
        Collaborator::ready(HalfLabels),
        Collaborator::ready(Invert { size: 8, delay }),
    )
}

#[tokio::test]
async fn full_flow_aligns_every_buffer_to_content() {
    let mut p = pipeline(Duration::ZERO);
    p.load_content(content(40, 24)).await.unwrap();
    assert_eq!(p.mask().unwrap().dimensions(), (40, 24));
    assert_eq!(p.mask_origin(), Some(MaskOrigin::Segmentation));

    p.select_style(style()).await.unwrap();
    assert_eq!(p.stylized().unwrap().dimensions(), (40, 24));

    let OutputState::Ready(output) = p.output() else {
        panic!("expected output");
    };
    assert_eq!(output.dimensions(), (40, 24));
    assert_eq!(output.get_pixel(2, 12).0, INVERTED);
    assert_eq!(output.get_pixel(37, 12).0, CONTENT);
}

#[tokio::test(start_paused = true)]
async fn mask_edits_while_model_runs_land_with_the_result() {
    let mut p = pipeline(Duration::from_secs(3));
    p.load_content(content(40, 24)).await.unwrap();
    let job = p.begin_stylize(style()).unwrap();

    let edits = async {
        p.open_editor()?;
        p.set_brush_radius(4)?;
        p.begin_stroke(36, 12)?;
        p.continue_stroke(30, 12)?;
        let recompute = p.end_stroke()?;
        assert!(matches!(p.output(), OutputState::Pending { previous: None }));
        p.close_editor()?;
        Ok::<_, StyleMaskError>(recompute)
    };
    let (outcome, recompute) = tokio::join!(job.run(), edits);
    assert!(matches!(recompute.unwrap(), Recompute::Deferred));

    assert_eq!(p.finish_stylize(outcome).unwrap(), StylizeDisposition::Applied);
    let OutputState::Ready(output) = p.output() else {
        panic!("expected output");
    };
    assert_eq!(output.get_pixel(36, 12).0, INVERTED);
    assert_eq!(output.get_pixel(28, 2).0, CONTENT);
}

#[tokio::test(start_paused = true)]
async fn reload_while_stylizing_discards_the_old_result() {
    let mut p = pipeline(Duration::from_secs(2));
    p.load_content(content(16, 16)).await.unwrap();
    let job = p.begin_stylize(style()).unwrap();

    let next = RgbaImage::from_pixel(16, 16, Rgba([10, 10, 10, 255]));
    p.load_content(next).await.unwrap();

    let outcome = job.run().await;
    assert!(matches!(
        p.finish_stylize(outcome).unwrap(),
        StylizeDisposition::Discarded { .. }
    ));
    assert_eq!(p.state(), PipelineState::MaskReady);
    assert_eq!(p.output(), OutputState::Empty);
}

#[tokio::test]
async fn strength_and_masking_toggle_reuse_cached_stylization() {
    let mut p = pipeline(Duration::ZERO);
    p.load_content(content(16, 16)).await.unwrap();
    p.select_style(style()).await.unwrap();

    assert!(matches!(p.set_strength(0.5).unwrap(), Recompute::Composited));
    let OutputState::Ready(output) = p.output() else {
        panic!("expected output");
    };
    assert_eq!(output.get_pixel(1, 8).0, [128, 128, 128, 255]);

    assert!(matches!(p.set_masking(false).unwrap(), Recompute::Composited));
    let OutputState::Ready(output) = p.output() else {
        panic!("expected output");
    };
    assert_eq!(output.get_pixel(15, 8).0, [128, 128, 128, 255]);
}

#[tokio::test]
async fn painting_out_the_subject_leaves_content_untouched() {
    let mut p = pipeline(Duration::ZERO);
    p.load_content(content(16, 16)).await.unwrap();
    p.select_style(style()).await.unwrap();

    p.open_editor().unwrap();
    p.set_brush_radius(32).unwrap();
    assert!(matches!(
        p.edit_stroke(0, 0, BrushMode::Exclude).unwrap(),
        Recompute::Composited
    ));
    p.close_editor().unwrap();

    let OutputState::Ready(output) = p.output() else {
        panic!("expected output");
    };
    assert_eq!(output, &content(16, 16));
    assert_eq!(
        p.take_warnings(),
        vec![PipelineWarning::EmptyMask {
            origin: MaskOrigin::Edited
        }]
    );
}

#[tokio::test]
async fn onnx_pipeline_without_models_still_masks() {
    let mut p = onnx_pipeline(PipelineSettings::default(), None, None);
    p.load_content(content(20, 20)).await.unwrap();
    assert_eq!(p.mask_origin(), Some(MaskOrigin::Heuristic));
    assert!(matches!(
        p.take_warnings().as_slice(),
        [PipelineWarning::SegmentationFallback { .. }]
    ));

    let err = p.select_style(style()).await.unwrap_err();
    assert!(matches!(err, StyleMaskError::StylizeFailed(_)));
    assert!(matches!(p.output(), OutputState::Failed { previous: None, .. }));
}
