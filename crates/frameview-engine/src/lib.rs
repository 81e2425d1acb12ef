//! Frameview engine crate.
//!
//! Presents a CPU-rendered ARGB frame buffer on a GPU surface with
//! aspect-correct letterboxing, plus an optional crosshair marker drawn over
//! the image. GPU access goes through the [`backend::Backend`] seam so the
//! presentation logic runs unchanged on wgpu or on the recording backend.

pub mod backend;
pub mod buffer;
pub mod coords;
pub mod geometry;
pub mod logging;
pub mod pixels;
pub mod present;
pub mod render;

pub use present::{FilterMode, Presenter, PresenterConfig};
