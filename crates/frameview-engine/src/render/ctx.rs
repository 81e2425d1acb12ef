use crate::coords::Size;

/// Target for drawing (encoder + color view + the view's pixel size).
///
/// The size bounds the scissor rectangle. Viewports are passed to the pass
/// unchanged and may extend past the attachment; the scissor clips the draw
/// to the pixels that exist.
pub struct RenderTarget<'a> {
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub color_view: &'a wgpu::TextureView,
    pub size: Size,
}

impl<'a> RenderTarget<'a> {
    #[inline]
    pub fn new(
        encoder: &'a mut wgpu::CommandEncoder,
        color_view: &'a wgpu::TextureView,
        size: Size,
    ) -> Self {
        Self { encoder, color_view, size }
    }
}
