//! Streaming GPU buffers.
//!
//! Geometry that changes every frame is written into a buffer allocated
//! once, instead of reallocating GPU memory per frame.

mod stream;

pub use stream::StreamBuffer;
