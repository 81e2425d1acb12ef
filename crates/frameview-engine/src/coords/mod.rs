//! Coordinate and geometry types shared by the presenter and its backends.
//!
//! Pixel space:
//! - origin top-left
//! - +X right, +Y down
//!
//! Geometry generators emit NDC directly; no viewport uniform is involved.

mod color;
mod rect;
mod size;
mod vec2;

pub use color::ColorRgb;
pub use rect::Rect;
pub use size::Size;
pub use vec2::Vec2;
