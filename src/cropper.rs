//! Interactive crop selection.
//!
//! [`Cropper`] holds the crop rectangle a user manipulates over a displayed
//! (possibly scaled) bitmap. Pointer input arrives in display coordinates and
//! is converted with the displayed-to-natural scale factors, so the geometry
//! it emits is always in source pixels.
//!
//! ```text
//! Idle ──click/drag/select──▶ Selecting ──confirm──▶ Confirmed
//!   └──────────────────────confirm──────────────────▶ Confirmed(whole image)
//! ```

use crate::imaging::{
    AspectRatio, CropGeometry, Dimensions, clamp_selection, constrain_to_aspect, default_selection,
    display_to_source, scale_factors, selection_from_drag,
};
use thiserror::Error;

/// Default seed size, as a fraction of each side of the image.
pub const DEFAULT_SEED_FRACTION: f64 = 0.5;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CropError {
    #[error("image failed to load: {0}")]
    Load(String),
}

/// Point in display coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Rectangle in display coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CropState {
    Idle,
    Selecting(CropGeometry),
    /// `None` means the whole image.
    Confirmed(Option<CropGeometry>),
}

#[derive(Debug, Clone)]
pub struct Cropper {
    natural: Dimensions,
    display: Dimensions,
    aspect: Option<AspectRatio>,
    seed_fraction: f64,
    state: CropState,
    drag_anchor: Option<(u32, u32)>,
    load_error: Option<String>,
}

impl Cropper {
    /// Cropper over a bitmap of `natural` size, displayed at natural size
    /// until [`with_display`](Self::with_display) says otherwise.
    pub fn new(natural: Dimensions, aspect: Option<AspectRatio>) -> Self {
        Self {
            natural,
            display: natural,
            aspect,
            seed_fraction: DEFAULT_SEED_FRACTION,
            state: CropState::Idle,
            drag_anchor: None,
            load_error: None,
        }
    }

    pub fn with_display(mut self, display: Dimensions) -> Self {
        self.display = display;
        self
    }

    pub fn with_seed_fraction(mut self, fraction: f64) -> Self {
        self.seed_fraction = fraction;
        self
    }

    /// Update the displayed size (e.g. after a window resize).
    pub fn set_display(&mut self, display: Dimensions) {
        self.display = display;
    }

    pub fn state(&self) -> CropState {
        self.state
    }

    pub fn natural(&self) -> Dimensions {
        self.natural
    }

    pub fn aspect(&self) -> Option<AspectRatio> {
        self.aspect
    }

    /// Current selection in source pixels, if any.
    pub fn selection(&self) -> Option<CropGeometry> {
        match self.state {
            CropState::Selecting(g) => Some(g),
            CropState::Confirmed(g) => g,
            CropState::Idle => None,
        }
    }

    /// Whether the save action may proceed.
    pub fn can_save(&self) -> bool {
        self.load_error.is_none()
    }

    fn to_source(&self, p: Point) -> (u32, u32) {
        display_to_source(
            (p.x, p.y),
            scale_factors(self.natural, self.display),
            self.natural,
        )
    }

    fn is_editable(&self) -> bool {
        self.load_error.is_none() && !matches!(self.state, CropState::Confirmed(_))
    }

    /// A click with no prior rectangle seeds a default one around the point.
    pub fn click(&mut self, at: Point) {
        if !self.is_editable() || self.state != CropState::Idle {
            return;
        }
        let center = self.to_source(at);
        let seeded = default_selection(self.natural, center, self.aspect, self.seed_fraction);
        self.state = CropState::Selecting(seeded);
    }

    pub fn begin_drag(&mut self, at: Point) {
        if !self.is_editable() {
            return;
        }
        self.drag_anchor = Some(self.to_source(at));
    }

    pub fn drag_to(&mut self, at: Point) {
        if !self.is_editable() {
            return;
        }
        let Some(anchor) = self.drag_anchor else {
            return;
        };
        let geometry = selection_from_drag(anchor, self.to_source(at), self.aspect);
        if geometry.width > 0 && geometry.height > 0 {
            self.state = CropState::Selecting(geometry);
        }
    }

    pub fn end_drag(&mut self) {
        self.drag_anchor = None;
    }

    /// Set the rectangle directly from display coordinates.
    pub fn select(&mut self, rect: DisplayRect) {
        if !self.is_editable() {
            return;
        }
        let (sx, sy) = scale_factors(self.natural, self.display);
        let geometry = CropGeometry::new(
            (rect.x * sx).round().max(0.0) as u32,
            (rect.y * sy).round().max(0.0) as u32,
            (rect.width * sx).round().max(0.0) as u32,
            (rect.height * sy).round().max(0.0) as u32,
        )
        .with_aspect(self.aspect);
        self.set_geometry(geometry);
    }

    /// Set the rectangle directly in source pixels, aspect-locked and
    /// clamped to the image.
    pub fn set_geometry(&mut self, geometry: CropGeometry) {
        if !self.is_editable() {
            return;
        }
        let geometry = match self.aspect {
            Some(aspect) => {
                let (width, height) = constrain_to_aspect(geometry.width, geometry.height, aspect);
                CropGeometry {
                    width,
                    height,
                    aspect: Some(aspect),
                    ..geometry
                }
            }
            None => geometry,
        };
        let clamped = clamp_selection(geometry, self.natural);
        if clamped.width > 0 && clamped.height > 0 {
            self.state = CropState::Selecting(clamped);
        }
    }

    /// Fix the geometry. `Ok(None)` means crop nothing: use the whole image.
    pub fn confirm(&mut self) -> Result<Option<CropGeometry>, CropError> {
        if let Some(reason) = &self.load_error {
            return Err(CropError::Load(reason.clone()));
        }
        let geometry = match self.state {
            CropState::Idle => None,
            CropState::Selecting(g) => Some(g).filter(|g| g.fits_within(self.natural)),
            CropState::Confirmed(g) => g,
        };
        self.state = CropState::Confirmed(geometry);
        self.drag_anchor = None;
        Ok(geometry)
    }

    /// The bitmap could not be decoded or displayed; saving stays blocked.
    pub fn fail_load(&mut self, reason: impl Into<String>) {
        self.load_error = Some(reason.into());
    }

    pub fn reset(&mut self) {
        self.state = CropState::Idle;
        self.drag_anchor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cropper(w: u32, h: u32) -> Cropper {
        Cropper::new(Dimensions::new(w, h), None)
    }

    #[test]
    fn starts_idle_and_confirms_whole_image() {
        let mut c = cropper(800, 600);
        assert_eq!(c.state(), CropState::Idle);
        assert_eq!(c.confirm().unwrap(), None);
        assert_eq!(c.state(), CropState::Confirmed(None));
    }

    #[test]
    fn click_seeds_half_size_rect_around_point() {
        let mut c = cropper(800, 600);
        c.click(Point::new(400.0, 300.0));
        let sel = c.selection().unwrap();
        assert_eq!((sel.x, sel.y, sel.width, sel.height), (200, 150, 400, 300));
    }

    #[test]
    fn click_on_scaled_display_converts_to_source_pixels() {
        // 4000x3000 bitmap shown at 800x600
        let mut c = Cropper::new(Dimensions::new(4000, 3000), Some(AspectRatio::new(1, 1)))
            .with_display(Dimensions::new(800, 600));
        c.click(Point::new(400.0, 300.0));
        let sel = c.selection().unwrap();
        // 50% → 2000x1500, squared → 1500x1500, centred on (2000, 1500)
        assert_eq!((sel.x, sel.y, sel.width, sel.height), (1250, 750, 1500, 1500));
        assert_eq!(sel.aspect, Some(AspectRatio::new(1, 1)));
    }

    #[test]
    fn second_click_keeps_existing_rect() {
        let mut c = cropper(800, 600);
        c.click(Point::new(400.0, 300.0));
        let first = c.selection();
        c.click(Point::new(10.0, 10.0));
        assert_eq!(c.selection(), first);
    }

    #[test]
    fn drag_defines_rect_in_source_space() {
        let mut c = cropper(1600, 1200).with_display(Dimensions::new(800, 600));
        c.begin_drag(Point::new(100.0, 100.0));
        c.drag_to(Point::new(300.0, 200.0));
        c.end_drag();
        let sel = c.selection().unwrap();
        assert_eq!((sel.x, sel.y, sel.width, sel.height), (200, 200, 400, 200));
    }

    #[test]
    fn drag_past_edge_is_clamped() {
        let mut c = cropper(400, 300);
        c.begin_drag(Point::new(300.0, 200.0));
        c.drag_to(Point::new(900.0, 900.0));
        let sel = c.selection().unwrap();
        assert_eq!((sel.x, sel.y, sel.width, sel.height), (300, 200, 100, 100));
        assert!(sel.fits_within(c.natural()));
    }

    #[test]
    fn banner_drag_is_aspect_locked() {
        let mut c = Cropper::new(Dimensions::new(1920, 1080), Some(AspectRatio::new(16, 9)));
        c.begin_drag(Point::new(0.0, 0.0));
        c.drag_to(Point::new(1600.0, 1000.0));
        let sel = c.selection().unwrap();
        assert_eq!((sel.width, sel.height), (1600, 900));
    }

    #[test]
    fn select_from_display_rect() {
        let mut c = cropper(1000, 1000).with_display(Dimensions::new(500, 500));
        c.select(DisplayRect {
            x: 10.0,
            y: 20.0,
            width: 100.0,
            height: 50.0,
        });
        let sel = c.selection().unwrap();
        assert_eq!((sel.x, sel.y, sel.width, sel.height), (20, 40, 200, 100));
    }

    #[test]
    fn set_geometry_honours_context_aspect() {
        let mut c = Cropper::new(Dimensions::new(1000, 1000), Some(AspectRatio::new(1, 1)));
        c.set_geometry(CropGeometry::new(100, 100, 400, 200));
        let sel = c.selection().unwrap();
        assert_eq!((sel.x, sel.y, sel.width, sel.height), (100, 100, 200, 200));
        assert_eq!(sel.aspect, Some(AspectRatio::new(1, 1)));
    }

    #[test]
    fn degenerate_geometry_ignored() {
        let mut c = cropper(100, 100);
        c.set_geometry(CropGeometry::new(10, 10, 0, 5));
        assert_eq!(c.state(), CropState::Idle);
        assert_eq!(c.confirm().unwrap(), None);
    }

    #[test]
    fn confirm_fixes_selection() {
        let mut c = cropper(800, 600);
        c.click(Point::new(400.0, 300.0));
        let confirmed = c.confirm().unwrap();
        assert!(confirmed.is_some());
        // Further input is ignored once confirmed
        c.begin_drag(Point::new(0.0, 0.0));
        c.drag_to(Point::new(10.0, 10.0));
        assert_eq!(c.selection(), confirmed);
    }

    #[test]
    fn load_failure_blocks_confirm() {
        let mut c = cropper(800, 600);
        c.fail_load("corrupt JPEG");
        assert!(!c.can_save());
        assert_eq!(c.confirm(), Err(CropError::Load("corrupt JPEG".to_string())));
    }

    #[test]
    fn reset_returns_to_idle() {
        let mut c = cropper(800, 600);
        c.click(Point::new(1.0, 1.0));
        c.confirm().unwrap();
        c.reset();
        assert_eq!(c.state(), CropState::Idle);
    }
}
