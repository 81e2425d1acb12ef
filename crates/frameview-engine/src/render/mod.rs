//! Per-frame render target handed to the wgpu backend.
//!
//! Each presenter draw records its own render pass into the caller's encoder,
//! loading the existing target contents, so the main image and the overlay can
//! be interleaved with any other passes the application records.

mod ctx;

pub use ctx::RenderTarget;
