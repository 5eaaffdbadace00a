//! Interactive brush editing of a mask.
//!
//! An [`EditSession`] owns the mask for as long as it is open. Pointer events are
//! applied in the order they arrive; each one stamps a filled disc that forces the
//! covered pixels to fully included or fully excluded.

use image::{GrayImage, Luma};

/// What a brush stroke does to the pixels it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrushMode {
    /// Paint pixels into the mask (255).
    #[default]
    Include,
    /// Erase pixels from the mask (0).
    Exclude,
}

impl BrushMode {
    fn value(self) -> u8 {
        match self {
            BrushMode::Include => 255,
            BrushMode::Exclude => 0,
        }
    }
}

/// What a finished stroke did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrokeSummary {
    pub mode: BrushMode,
    /// Number of discs stamped, interpolated ones included.
    pub dabs: usize,
    /// Pixels whose value actually changed.
    pub changed_pixels: usize,
}

#[derive(Debug, Clone, Copy)]
struct ActiveStroke {
    mode: BrushMode,
    radius: u32,
    last: (i64, i64),
    dabs: usize,
    changed_pixels: usize,
}

/// Exclusive editing session over one mask.
#[derive(Debug, Clone)]
pub struct EditSession {
    mask: GrayImage,
    radius: u32,
    mode: BrushMode,
    interpolate: bool,
    stroke: Option<ActiveStroke>,
}

impl EditSession {
    /// Take ownership of `mask` for editing. The radius is at least one pixel.
    pub fn new(mask: GrayImage, radius: u32) -> Self {
        Self {
            mask,
            radius: radius.max(1),
            mode: BrushMode::default(),
            interpolate: false,
            stroke: None,
        }
    }

    /// Also stamp discs along the segment between consecutive pointer positions.
    pub fn with_interpolation(mut self, interpolate: bool) -> Self {
        self.interpolate = interpolate;
        self
    }

    pub fn mask(&self) -> &GrayImage {
        &self.mask
    }

    /// Close the session and hand the mask back.
    pub fn into_mask(self) -> GrayImage {
        self.mask
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    pub fn mode(&self) -> BrushMode {
        self.mode
    }

    pub fn is_stroking(&self) -> bool {
        self.stroke.is_some()
    }

    /// Change the brush mode. A stroke already in progress keeps its mode.
    pub fn set_mode(&mut self, mode: BrushMode) {
        self.mode = mode;
    }

    /// Change the brush radius (minimum 1). A stroke already in progress keeps its radius.
    pub fn set_radius(&mut self, radius: u32) {
        self.radius = radius.max(1);
    }

    /// Start a stroke at `(x, y)` and stamp the first disc. An unfinished previous
    /// stroke is implicitly ended.
    pub fn begin_stroke(&mut self, x: i64, y: i64) {
        let mut stroke = ActiveStroke {
            mode: self.mode,
            radius: self.radius,
            last: (x, y),
            dabs: 0,
            changed_pixels: 0,
        };
        stamp(&mut self.mask, &mut stroke, x, y);
        self.stroke = Some(stroke);
    }

    /// Move the pointer of the current stroke to `(x, y)`. Ignored without a stroke.
    pub fn continue_stroke(&mut self, x: i64, y: i64) {
        let Some(mut stroke) = self.stroke.take() else {
            return;
        };
        if self.interpolate {
            interpolate_segment(&mut self.mask, &mut stroke, (x, y));
        }
        stamp(&mut self.mask, &mut stroke, x, y);
        stroke.last = (x, y);
        self.stroke = Some(stroke);
    }

    /// Finish the current stroke, or return `None` if none was active.
    pub fn end_stroke(&mut self) -> Option<StrokeSummary> {
        self.stroke.take().map(|stroke| StrokeSummary {
            mode: stroke.mode,
            dabs: stroke.dabs,
            changed_pixels: stroke.changed_pixels,
        })
    }
}

/// Paint one disc for the stroke and account for it.
fn stamp(mask: &mut GrayImage, stroke: &mut ActiveStroke, x: i64, y: i64) {
    stroke.dabs += 1;
    stroke.changed_pixels += paint_disc(mask, x, y, stroke.radius, stroke.mode);
}

/// Stamp discs every half radius between the stroke's last position and `to`,
/// endpoints excluded. Only the part of the segment whose discs can reach the
/// mask is walked, so far off-canvas pointers cost nothing.
fn interpolate_segment(mask: &mut GrayImage, stroke: &mut ActiveStroke, to: (i64, i64)) {
    let (lx, ly) = stroke.last;
    let spacing = f64::from((stroke.radius / 2).max(1));
    let (dx, dy) = (to.0 as f64 - lx as f64, to.1 as f64 - ly as f64);
    let steps = (dx.hypot(dy) / spacing).ceil().max(1.0);

    let reach = f64::from(stroke.radius);
    let lower = (-reach, -reach);
    let upper = (
        f64::from(mask.width()) - 1.0 + reach,
        f64::from(mask.height()) - 1.0 + reach,
    );
    let Some((t0, t1)) = clip_segment((lx as f64, ly as f64), (dx, dy), lower, upper) else {
        return;
    };

    let first = (t0 * steps).ceil().max(1.0) as u64;
    let last = (t1 * steps).floor().min(steps - 1.0);
    if last < 1.0 {
        return;
    }
    for step in first..=last as u64 {
        let t = step as f64 / steps;
        let px = lx.saturating_add((dx * t).round() as i64);
        let py = ly.saturating_add((dy * t).round() as i64);
        stamp(mask, stroke, px, py);
    }
}

/// Liang-Barsky clip of `start + t * delta`, `t` in [0, 1], against the box
/// `lower..=upper`. Returns the `t` range inside the box.
fn clip_segment(
    start: (f64, f64),
    delta: (f64, f64),
    lower: (f64, f64),
    upper: (f64, f64),
) -> Option<(f64, f64)> {
    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;
    let edges = [
        (-delta.0, start.0 - lower.0),
        (delta.0, upper.0 - start.0),
        (-delta.1, start.1 - lower.1),
        (delta.1, upper.1 - start.1),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            t0 = t0.max(t);
        } else {
            t1 = t1.min(t);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((t0, t1))
}

/// Set every pixel within `radius` of `(cx, cy)` to the mode's value, clipped to the
/// mask. Returns how many pixels changed.
pub fn paint_disc(mask: &mut GrayImage, cx: i64, cy: i64, radius: u32, mode: BrushMode) -> usize {
    let (w, h) = (i64::from(mask.width()), i64::from(mask.height()));
    let r = i64::from(radius);
    let r2 = r.saturating_mul(r);
    let value = mode.value();

    let x0 = cx.saturating_sub(r).max(0);
    let x1 = cx.saturating_add(r).min(w - 1);
    let y0 = cy.saturating_sub(r).max(0);
    let y1 = cy.saturating_add(r).min(h - 1);

    let mut changed = 0;
    for y in y0..=y1 {
        let dy = y - cy;
        for x in x0..=x1 {
            let dx = x - cx;
            if dx * dx + dy * dy > r2 {
                continue;
            }
            let px = mask.get_pixel_mut(x as u32, y as u32);
            if px[0] != value {
                *px = Luma([value]);
                changed += 1;
            }
        }
    }
    changed
}
