/// Component format of a vertex attribute.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum VertexFormat {
    Float32x2,
}

impl VertexFormat {
    pub const fn size(self) -> u64 {
        match self {
            VertexFormat::Float32x2 => 8,
        }
    }
}

/// One named vertex input.
///
/// `name` matches the shader-side input so diagnostics can say which binding
/// is involved; `location` is the slot the shader reads it from.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VertexAttribute {
    pub name: &'static str,
    pub location: u32,
    pub format: VertexFormat,
    pub offset: u64,
}

/// Interleaved layout of a single vertex buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VertexLayout {
    pub stride: u64,
    pub attributes: &'static [VertexAttribute],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{MarkerVertex, QuadVertex};
    use crate::present::{MARKER_SHADER, PRESENT_SHADER};

    fn check(layout: &VertexLayout, shader: &str) {
        let mut end = 0;
        for attr in layout.attributes {
            assert_eq!(attr.offset, end, "{} is not tightly packed", attr.name);
            end += attr.format.size();
            let decl = format!("@location({}) {}:", attr.location, attr.name);
            assert!(shader.contains(&decl), "shader lacks `{decl}`");
        }
        assert_eq!(end, layout.stride);
    }

    #[test]
    fn layouts_match_structs_and_shaders() {
        check(&QuadVertex::LAYOUT, PRESENT_SHADER);
        check(&MarkerVertex::LAYOUT, MARKER_SHADER);
    }
}
