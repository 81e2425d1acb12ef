use super::{Size, Vec2};

/// Axis-aligned rectangle in target pixels (top-left origin).
///
/// Used for overlay viewports. Components are `f32` so callers can pass
/// fractional layouts straight through to the GPU viewport.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rect {
    pub origin: Vec2,
    pub size: Vec2,
}

impl Rect {
    #[inline]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            origin: Vec2::new(x, y),
            size: Vec2::new(w, h),
        }
    }

    /// Rectangle anchored at the origin covering `size`.
    #[inline]
    pub fn from_size(size: Size) -> Self {
        Self::new(0.0, 0.0, size.width as f32, size.height as f32)
    }

    #[inline]
    pub fn max(self) -> Vec2 {
        Vec2::new(self.origin.x + self.size.x, self.origin.y + self.size.y)
    }

    /// True for non-positive width or height (NaN counts as empty).
    #[inline]
    pub fn is_empty(self) -> bool {
        !(self.size.x > 0.0 && self.size.y > 0.0)
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.origin.is_finite() && self.size.is_finite()
    }

    /// Width divided by height. Only meaningful for non-empty rects.
    #[inline]
    pub fn aspect(self) -> f32 {
        self.size.x / self.size.y
    }

    #[inline]
    pub fn intersect(self, other: Rect) -> Option<Rect> {
        let x0 = self.origin.x.max(other.origin.x);
        let y0 = self.origin.y.max(other.origin.y);
        let x1 = self.max().x.min(other.max().x);
        let y1 = self.max().y.min(other.max().y);

        let w = x1 - x0;
        let h = y1 - y0;

        if w <= 0.0 || h <= 0.0 {
            None
        } else {
            Some(Rect::new(x0, y0, w, h))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(x: f32, y: f32, w: f32, h: f32) -> Rect {
        Rect::new(x, y, w, h)
    }

    // ── is_empty ──────────────────────────────────────────────────────────

    #[test]
    fn is_empty_zero_or_negative_size() {
        assert!(r(0.0, 0.0, 0.0, 5.0).is_empty());
        assert!(r(0.0, 0.0, 5.0, -1.0).is_empty());
        assert!(r(0.0, 0.0, f32::NAN, 5.0).is_empty());
    }

    #[test]
    fn is_empty_positive_size() {
        assert!(!r(0.0, 0.0, 1.0, 1.0).is_empty());
    }

    // ── intersect ─────────────────────────────────────────────────────────

    #[test]
    fn intersect_clips_to_target() {
        let target = Rect::from_size(Size::new(800, 600));
        let vp = r(-100.0, 500.0, 400.0, 400.0);
        assert_eq!(vp.intersect(target), Some(r(0.0, 500.0, 300.0, 100.0)));
    }

    #[test]
    fn intersect_contained() {
        let outer = r(0.0, 0.0, 100.0, 100.0);
        let inner = r(10.0, 10.0, 20.0, 20.0);
        assert_eq!(outer.intersect(inner), Some(inner));
    }

    #[test]
    fn intersect_touching_edge_returns_none() {
        let a = r(0.0, 0.0, 10.0, 10.0);
        let b = r(10.0, 0.0, 10.0, 10.0);
        assert!(a.intersect(b).is_none());
    }

    // ── aspect ────────────────────────────────────────────────────────────

    #[test]
    fn aspect_is_width_over_height() {
        assert_eq!(r(0.0, 0.0, 1920.0, 1080.0).aspect(), 1920.0 / 1080.0);
    }
}
