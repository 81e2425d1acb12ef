/// 2D point or offset.
///
/// The presenter uses it for normalized window coordinates (`[0, 1]`, origin
/// top-left, +Y down) and for NDC positions (`[-1, 1]`, +Y up).
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Maps a normalized window coordinate to NDC: `(2x - 1, 1 - 2y)`.
    ///
    /// Window coordinates grow downward, NDC grows upward, hence the y flip.
    #[inline]
    pub fn window_to_ndc(self) -> Vec2 {
        Vec2::new(self.x * 2.0 - 1.0, 1.0 - self.y * 2.0)
    }

    #[inline]
    pub fn to_array(self) -> [f32; 2] {
        [self.x, self.y]
    }
}
