//! CPU-side pixel format conversion.
//!
//! Frames arrive as packed `0xAARRGGBB` integers; the display texture is
//! `Rgba8Unorm`, i.e. bytes in R, G, B, A order.

mod convert;

pub use convert::{argb_to_rgba, argb_to_rgba_into, BYTES_PER_PIXEL};
