//! Frame presentation.
//!
//! [`Presenter`] owns the GPU side of showing an emulator-style frame buffer:
//! the frame texture, the letterboxed quad and the crosshair overlay.
//!
//! Typical per-frame flow:
//! - `resize` when the window changes
//! - `update_frame` with the latest CPU frame
//! - `render_main`, then optionally `render_overlay`

mod config;
mod presenter;

pub use crate::backend::FilterMode;
pub use config::PresenterConfig;
pub use presenter::Presenter;

/// WGSL for the textured frame quad.
pub const PRESENT_SHADER: &str = include_str!("shaders/present.wgsl");
/// WGSL for the flat-colored crosshair.
pub const MARKER_SHADER: &str = include_str!("shaders/marker.wgsl");
