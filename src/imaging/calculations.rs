//! Pure calculation functions for crop geometry, target dimensions and the
//! encoder's quality ladder.
//!
//! All functions here are pure and testable without any I/O or images.

use super::backend::Dimensions;
use super::params::{AspectRatio, CropGeometry, EncodingBudget, Quality};

/// Tolerance absorbed when dividing the quality span by the step, so that
/// `(0.8 - 0.1) / 0.1` counts as 7 steps and not 6.999….
const LADDER_EPSILON: f64 = 1e-4;

/// Scale `source` down so its longest side is at most `max_dimension`,
/// preserving aspect ratio. Never upscales; each side is at least 1px.
///
/// # Examples
/// ```
/// # use unit_media::imaging::fit_within;
/// assert_eq!(fit_within((4000, 3000), 1920), (1920, 1440));
/// assert_eq!(fit_within((800, 600), 1920), (800, 600));
/// ```
pub fn fit_within(source: (u32, u32), max_dimension: u32) -> (u32, u32) {
    let (w, h) = source;
    let longer = w.max(h);
    if longer <= max_dimension || longer == 0 {
        return (w, h);
    }

    let ratio = max_dimension as f64 / longer as f64;
    if w >= h {
        let out_h = ((h as f64 * ratio).round() as u32).clamp(1, max_dimension);
        (max_dimension, out_h)
    } else {
        let out_w = ((w as f64 * ratio).round() as u32).clamp(1, max_dimension);
        (out_w, max_dimension)
    }
}

/// Displayed-to-natural scale factors `(natural_w / display_w, natural_h / display_h)`.
///
/// A zero display size (image not laid out yet) maps 1:1.
pub fn scale_factors(natural: Dimensions, display: Dimensions) -> (f64, f64) {
    let sx = if display.width == 0 {
        1.0
    } else {
        natural.width as f64 / display.width as f64
    };
    let sy = if display.height == 0 {
        1.0
    } else {
        natural.height as f64 / display.height as f64
    };
    (sx, sy)
}

/// Convert a display-space point to source pixels, clamped to the image.
pub fn display_to_source(point: (f64, f64), scale: (f64, f64), natural: Dimensions) -> (u32, u32) {
    let x = (point.0 * scale.0).round().clamp(0.0, natural.width as f64) as u32;
    let y = (point.1 * scale.1).round().clamp(0.0, natural.height as f64) as u32;
    (x, y)
}

/// Largest `width × height` box with the given aspect ratio that fits inside
/// `(width, height)`.
pub fn constrain_to_aspect(width: u32, height: u32, aspect: AspectRatio) -> (u32, u32) {
    if width == 0 || height == 0 || aspect.width == 0 || aspect.height == 0 {
        return (width, height);
    }
    let target = aspect.ratio();
    let current = width as f64 / height as f64;

    if current > target {
        // Too wide: keep height, narrow the width
        let w = ((height as f64 * target).round() as u32).clamp(1, width);
        (w, height)
    } else {
        // Too tall: keep width, shorten the height
        let h = ((width as f64 / target).round() as u32).clamp(1, height);
        (width, h)
    }
}

/// Seed rectangle for a click with no prior selection.
///
/// Sized `fraction` of the image on each axis (aspect-constrained when a
/// ratio is given), centred on `center` and shifted back inside the image
/// when it would overflow an edge.
pub fn default_selection(
    natural: Dimensions,
    center: (u32, u32),
    aspect: Option<AspectRatio>,
    fraction: f64,
) -> CropGeometry {
    let fraction = fraction.clamp(0.0, 1.0);
    let w = ((natural.width as f64 * fraction).round() as u32).clamp(1, natural.width.max(1));
    let h = ((natural.height as f64 * fraction).round() as u32).clamp(1, natural.height.max(1));
    let (w, h) = match aspect {
        Some(a) => constrain_to_aspect(w, h, a),
        None => (w, h),
    };

    let x = center_on(center.0, w, natural.width);
    let y = center_on(center.1, h, natural.height);

    CropGeometry::new(x, y, w, h).with_aspect(aspect)
}

/// Left/top edge of a `size`-long span centred on `center`, kept inside `[0, limit]`.
fn center_on(center: u32, size: u32, limit: u32) -> u32 {
    let max_start = limit.saturating_sub(size);
    center.saturating_sub(size / 2).min(max_start)
}

/// Rectangle spanned by a drag from `anchor` to `pointer` (both in source
/// pixels, already clamped to the image).
///
/// With an aspect ratio, the spanned box is shrunk to that ratio while
/// staying pinned to the anchor corner.
pub fn selection_from_drag(
    anchor: (u32, u32),
    pointer: (u32, u32),
    aspect: Option<AspectRatio>,
) -> CropGeometry {
    let raw_w = anchor.0.abs_diff(pointer.0);
    let raw_h = anchor.1.abs_diff(pointer.1);
    let (w, h) = match aspect {
        Some(a) => constrain_to_aspect(raw_w, raw_h, a),
        None => (raw_w, raw_h),
    };

    let x = if pointer.0 >= anchor.0 {
        anchor.0
    } else {
        anchor.0 - w
    };
    let y = if pointer.1 >= anchor.1 {
        anchor.1
    } else {
        anchor.1 - h
    };

    CropGeometry::new(x, y, w, h).with_aspect(aspect)
}

/// Clamp a rectangle into the image: origin first, then size.
pub fn clamp_selection(geometry: CropGeometry, natural: Dimensions) -> CropGeometry {
    let x = geometry.x.min(natural.width.saturating_sub(1));
    let y = geometry.y.min(natural.height.saturating_sub(1));
    let mut w = geometry.width.min(natural.width - x.min(natural.width));
    let mut h = geometry.height.min(natural.height - y.min(natural.height));
    if let Some(a) = geometry.aspect
        && (w != geometry.width || h != geometry.height)
    {
        (w, h) = constrain_to_aspect(w, h, a);
    }
    CropGeometry {
        x,
        y,
        width: w,
        height: h,
        aspect: geometry.aspect,
    }
}

/// Number of encode attempts the budget allows:
/// `floor((initial - min) / step) + 1`.
///
/// A non-positive step or an inverted range yields a single attempt.
pub fn attempt_count(budget: &EncodingBudget) -> usize {
    let initial = budget.initial_quality as f64;
    let min = budget.min_quality as f64;
    let step = budget.quality_step as f64;
    if step <= 0.0 || initial <= min {
        return 1;
    }
    ((initial - min) / step + LADDER_EPSILON).floor() as usize + 1
}

/// The qualities the encoder will try, highest first, produced lazily.
///
/// Computed from integer step indices so the ladder cannot drift below
/// `min_quality` through float accumulation.
pub fn quality_ladder(budget: &EncodingBudget) -> impl Iterator<Item = Quality> + use<> {
    let initial = budget.initial_quality as f64;
    let step = budget.quality_step as f64;
    (0..attempt_count(budget)).map(move |i| {
        let q = initial - i as f64 * step;
        // Round to the MIN_QUALITY_STEP grid so 0.70000005 reads back as 0.7
        Quality::new(((q * 1000.0).round() / 1000.0) as f32)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    // =========================================================================
    // fit_within tests
    // =========================================================================

    #[test]
    fn fit_landscape_clamps_width() {
        assert_eq!(fit_within((4000, 3000), 1920), (1920, 1440));
    }

    #[test]
    fn fit_portrait_clamps_height() {
        assert_eq!(fit_within((3000, 4000), 1920), (1440, 1920));
    }

    #[test]
    fn fit_never_upscales() {
        assert_eq!(fit_within((640, 480), 1920), (640, 480));
    }

    #[test]
    fn fit_extreme_ratio_keeps_one_pixel() {
        assert_eq!(fit_within((10_000, 1), 100), (100, 1));
    }

    #[test]
    fn fit_square() {
        assert_eq!(fit_within((2500, 2500), 1000), (1000, 1000));
    }

    // =========================================================================
    // Display → source conversion
    // =========================================================================

    #[test]
    fn scale_factors_from_display_size() {
        // 4000px image shown at 800px wide → 5x
        let (sx, sy) = scale_factors(dims(4000, 3000), dims(800, 600));
        assert_eq!(sx, 5.0);
        assert_eq!(sy, 5.0);
    }

    #[test]
    fn scale_factors_zero_display_is_identity() {
        assert_eq!(scale_factors(dims(100, 100), dims(0, 0)), (1.0, 1.0));
    }

    #[test]
    fn display_point_clamped_to_image() {
        let natural = dims(400, 300);
        assert_eq!(display_to_source((50.0, 20.0), (2.0, 2.0), natural), (100, 40));
        assert_eq!(display_to_source((500.0, -3.0), (2.0, 2.0), natural), (400, 0));
    }

    // =========================================================================
    // Aspect constraints
    // =========================================================================

    #[test]
    fn constrain_wide_box_to_square() {
        assert_eq!(constrain_to_aspect(400, 200, AspectRatio::new(1, 1)), (200, 200));
    }

    #[test]
    fn constrain_tall_box_to_banner() {
        // 16:9 inside 320x400 → 320x180
        assert_eq!(
            constrain_to_aspect(320, 400, AspectRatio::new(16, 9)),
            (320, 180)
        );
    }

    // =========================================================================
    // default_selection tests
    // =========================================================================

    #[test]
    fn default_selection_is_half_size_centred() {
        let sel = default_selection(dims(1000, 800), (500, 400), None, 0.5);
        assert_eq!((sel.x, sel.y, sel.width, sel.height), (250, 200, 500, 400));
    }

    #[test]
    fn default_selection_shifts_inside_near_edge() {
        let sel = default_selection(dims(1000, 800), (990, 5), None, 0.5);
        assert_eq!((sel.x, sel.y), (500, 0));
        assert!(sel.fits_within(dims(1000, 800)));
    }

    #[test]
    fn default_selection_honours_aspect() {
        let sel = default_selection(
            dims(1600, 1600),
            (800, 800),
            Some(AspectRatio::new(16, 9)),
            0.5,
        );
        assert_eq!((sel.width, sel.height), (800, 450));
        assert_eq!(sel.aspect, Some(AspectRatio::new(16, 9)));
    }

    // =========================================================================
    // selection_from_drag tests
    // =========================================================================

    #[test]
    fn drag_down_right() {
        let sel = selection_from_drag((10, 20), (110, 70), None);
        assert_eq!((sel.x, sel.y, sel.width, sel.height), (10, 20, 100, 50));
    }

    #[test]
    fn drag_up_left_pins_anchor_corner() {
        let sel = selection_from_drag((200, 200), (100, 150), None);
        assert_eq!((sel.x, sel.y, sel.width, sel.height), (100, 150, 100, 50));
    }

    #[test]
    fn drag_with_square_aspect_shrinks_longer_side() {
        let sel = selection_from_drag((200, 200), (100, 150), Some(AspectRatio::new(1, 1)));
        assert_eq!((sel.x, sel.y, sel.width, sel.height), (150, 150, 50, 50));
    }

    // =========================================================================
    // clamp_selection tests
    // =========================================================================

    #[test]
    fn clamp_trims_overflowing_rect() {
        let clamped = clamp_selection(CropGeometry::new(80, 10, 50, 50), dims(100, 100));
        assert_eq!((clamped.x, clamped.width), (80, 20));
        assert!(clamped.fits_within(dims(100, 100)));
    }

    // =========================================================================
    // Quality ladder
    // =========================================================================

    #[test]
    fn ladder_default_budget_has_eight_rungs() {
        let budget = EncodingBudget::default();
        assert_eq!(attempt_count(&budget), 8);
        let values: Vec<f32> = quality_ladder(&budget).map(|q| q.value()).collect();
        assert_eq!(values, vec![0.8, 0.7, 0.6, 0.5, 0.4, 0.3, 0.2, 0.1]);
    }

    #[test]
    fn ladder_with_uneven_step_stops_above_min() {
        let budget = EncodingBudget {
            initial_quality: 0.9,
            quality_step: 0.25,
            min_quality: 0.1,
            ..EncodingBudget::default()
        };
        let values: Vec<f32> = quality_ladder(&budget).map(|q| q.value()).collect();
        assert_eq!(values, vec![0.9, 0.65, 0.4, 0.15]);
    }

    #[test]
    fn ladder_is_lazy() {
        let budget = EncodingBudget {
            initial_quality: 1.0,
            quality_step: 1e-7,
            min_quality: 0.1,
            ..EncodingBudget::default()
        };
        let first: Vec<f32> = quality_ladder(&budget).take(2).map(|q| q.value()).collect();
        assert_eq!(first, vec![1.0, 1.0]);
    }

    #[test]
    fn ladder_degenerate_step_is_single_attempt() {
        let budget = EncodingBudget {
            quality_step: 0.0,
            ..EncodingBudget::default()
        };
        assert_eq!(attempt_count(&budget), 1);
    }
}
