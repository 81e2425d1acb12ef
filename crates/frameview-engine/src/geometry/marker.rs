use bytemuck::{Pod, Zeroable};

use crate::coords::{Rect, Vec2};

use super::vertex::{VertexAttribute, VertexFormat, VertexLayout};

/// Distance between the target point and each arrow tip (normalized units).
pub const MARKER_GAP: f32 = 0.004;
/// Full width of each arrow's base (normalized units).
pub const MARKER_BASE: f32 = 0.01;
/// Tip-to-base length of each arrow (normalized units).
pub const MARKER_HEIGHT: f32 = 0.02;

/// Four independent triangles.
pub const MARKER_VERTEX_COUNT: u32 = 12;

/// Marker vertex: NDC position only; color comes from a uniform.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct MarkerVertex {
    pub pos: [f32; 2],
}

impl MarkerVertex {
    const ATTRS: [VertexAttribute; 1] = [VertexAttribute {
        name: "pos",
        location: 0,
        format: VertexFormat::Float32x2,
        offset: 0,
    }];

    pub const LAYOUT: VertexLayout = VertexLayout {
        stride: std::mem::size_of::<MarkerVertex>() as u64,
        attributes: &Self::ATTRS,
    };
}

/// Aspect ratio expected by [`compute_marker`] for a given viewport.
///
/// Width over height: the generator scales vertical extents by this factor so
/// that a marker on a 16:9 viewport is as tall on screen as it is wide.
pub fn marker_aspect(viewport: Rect) -> f32 {
    if viewport.is_empty() {
        return 1.0;
    }
    viewport.aspect()
}

/// Builds the crosshair: four arrows pointing at `target` from below, above,
/// the left and the right.
///
/// `target` is in normalized viewport coordinates ((0,0) top-left, (1,1)
/// bottom-right). Triangles are emitted in that order, three vertices each,
/// tip first.
pub fn compute_marker(target: Vec2, aspect: f32) -> [MarkerVertex; 12] {
    let Vec2 { x, y } = target;

    let bx = MARKER_BASE * 0.5;
    let hy = (MARKER_GAP + MARKER_HEIGHT) * aspect;
    let by = bx * aspect;
    let reach = MARKER_GAP + MARKER_HEIGHT;

    let points = [
        // bottom
        Vec2::new(x, y + MARKER_GAP),
        Vec2::new(x + bx, y + hy),
        Vec2::new(x - bx, y + hy),
        // top
        Vec2::new(x, y - MARKER_GAP),
        Vec2::new(x - bx, y - hy),
        Vec2::new(x + bx, y - hy),
        // left
        Vec2::new(x - MARKER_GAP, y),
        Vec2::new(x - reach, y + by),
        Vec2::new(x - reach, y - by),
        // right
        Vec2::new(x + MARKER_GAP, y),
        Vec2::new(x + reach, y - by),
        Vec2::new(x + reach, y + by),
    ];

    points.map(|p| MarkerVertex { pos: p.window_to_ndc().to_array() })
}
