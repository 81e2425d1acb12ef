//! Procedural geometry for the presenter.
//!
//! Both generators are pure functions returning fixed-size vertex arrays in
//! NDC. Callers decide when to regenerate and where to upload.

mod marker;
mod quad;
mod vertex;

pub use marker::{
    compute_marker, marker_aspect, MarkerVertex, MARKER_BASE, MARKER_GAP, MARKER_HEIGHT,
    MARKER_VERTEX_COUNT,
};
pub use quad::{compute_quad, draw_extent, QuadVertex, QUAD_VERTEX_COUNT};
pub use vertex::{VertexAttribute, VertexFormat, VertexLayout};
