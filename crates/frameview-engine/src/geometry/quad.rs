use bytemuck::{Pod, Zeroable};

use crate::coords::Size;

use super::vertex::{VertexAttribute, VertexFormat, VertexLayout};

/// Vertices in the presentation quad (triangle strip).
pub const QUAD_VERTEX_COUNT: u32 = 4;

/// Textured quad vertex: NDC position + texture coordinate.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub pos: [f32; 2],
    pub uv: [f32; 2],
}

impl QuadVertex {
    const ATTRS: [VertexAttribute; 2] = [
        VertexAttribute { name: "pos", location: 0, format: VertexFormat::Float32x2, offset: 0 },
        VertexAttribute { name: "uv", location: 1, format: VertexFormat::Float32x2, offset: 8 },
    ];

    pub const LAYOUT: VertexLayout = VertexLayout {
        stride: std::mem::size_of::<QuadVertex>() as u64,
        attributes: &Self::ATTRS,
    };
}

/// Size in output pixels of the rectangle the source is drawn into.
///
/// With `stretch` the rectangle is the whole output. Otherwise the source is
/// scaled uniformly to fit (letterbox or pillarbox). Returns `None` when
/// either size is empty.
pub fn draw_extent(output: Size, source: Size, stretch: bool) -> Option<(f32, f32)> {
    if output.is_empty() || source.is_empty() {
        return None;
    }

    let out_w = output.width as f32;
    let out_h = output.height as f32;

    if stretch {
        return Some((out_w, out_h));
    }

    let src_w = source.width as f32;
    let src_h = source.height as f32;
    let scale = (out_w / src_w).min(out_h / src_h);

    Some((src_w * scale, src_h * scale))
}

/// Builds the centred presentation quad in NDC.
///
/// Strip order is bottom-left, bottom-right, top-left, top-right. Texture row
/// 0 holds the top scanline of the frame, so the top vertices get `v = 0`.
pub fn compute_quad(output: Size, source: Size, stretch: bool) -> Option<[QuadVertex; 4]> {
    let (draw_w, draw_h) = draw_extent(output, source, stretch)?;

    // Half extents in NDC: the full [-1, 1] range is two units wide.
    let hx = draw_w / output.width as f32;
    let hy = draw_h / output.height as f32;

    Some([
        QuadVertex { pos: [-hx, -hy], uv: [0.0, 1.0] },
        QuadVertex { pos: [hx, -hy], uv: [1.0, 1.0] },
        QuadVertex { pos: [-hx, hy], uv: [0.0, 0.0] },
        QuadVertex { pos: [hx, hy], uv: [1.0, 0.0] },
    ])
}
