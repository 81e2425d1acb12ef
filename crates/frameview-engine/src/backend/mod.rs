//! GPU backend seam.
//!
//! The presenter never talks to a graphics API directly. Everything it needs
//! (program compilation, vertex buffers, the frame texture, a sampler and
//! draws) goes through [`Backend`]:
//! - [`wgpu::WgpuBackend`] renders for real
//! - [`recording::RecordingBackend`] keeps everything on the CPU and records
//!   what was asked of it, for tests
//!
//! Resource handles are associated types owned by the caller. `destroy_*`
//! consumes the handle, so a resource cannot be released twice.

pub mod recording;
pub mod shader;
pub mod wgpu;

use anyhow::Result;

use crate::coords::{Rect, Size};
use crate::geometry::VertexLayout;

/// Primitive assembly for a program's draws.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Topology {
    TriangleStrip,
    TriangleList,
}

/// What a program reads besides its vertex buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ProgramInputs {
    /// Samples the frame texture (texture at binding 0, sampler at binding 1).
    Texture,
    /// Reads a solid `vec4` color from a uniform at binding 0.
    Color,
}

/// Everything needed to compile and link one program.
#[derive(Debug, Copy, Clone)]
pub struct ProgramDesc<'a> {
    /// Identifies the program in logs and errors.
    pub label: &'a str,
    /// WGSL source containing `vs_main` and `fs_main`.
    pub source: &'a str,
    pub layout: VertexLayout,
    pub topology: Topology,
    pub inputs: ProgramInputs,
}

/// Buffer binding target.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BufferKind {
    Vertex,
    Index,
}

/// Update-frequency hint.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BufferUsage {
    /// Written once, drawn many times.
    Static,
    /// Rewritten every few frames or more often.
    Dynamic,
}

#[derive(Debug, Copy, Clone)]
pub struct BufferDesc<'a> {
    pub label: &'a str,
    pub kind: BufferKind,
    pub usage: BufferUsage,
    /// Allocation size in bytes.
    pub capacity: u64,
    /// Bytes copied to the start of the buffer on creation.
    pub contents: Option<&'a [u8]>,
}

/// Texture sampling filter.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum FilterMode {
    /// Sharp pixels; the usual choice for emulator output.
    #[default]
    Nearest,
    Linear,
}

/// Color blending for a draw.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Blend {
    /// Fragments overwrite the target.
    Replace,
    /// Straight-alpha source-over: `src * a + dst * (1 - a)`.
    SourceOver,
}

/// One non-indexed draw.
///
/// Depth, stencil and face culling are always disabled.
pub struct DrawCall<'a, B: Backend + ?Sized> {
    pub program: &'a B::Program,
    /// Must be a [`BufferKind::Vertex`] buffer.
    pub vertices: &'a B::Buffer,
    /// Byte offset of the first vertex in `vertices`.
    ///
    /// Draws recorded before the same submit each read their own range, so
    /// per-draw geometry goes at distinct offsets.
    pub vertex_offset: u64,
    pub vertex_count: u32,
    /// Required by [`ProgramInputs::Texture`] programs.
    pub texture: Option<(&'a B::Texture, &'a B::Sampler)>,
    /// Required by [`ProgramInputs::Color`] programs.
    pub color: Option<[f32; 4]>,
    /// Target-pixel rectangle the NDC range maps to, top-left origin.
    ///
    /// It may hang past the target's edges; fragments outside the target are
    /// discarded without moving or rescaling the rest.
    pub viewport: Rect,
    pub blend: Blend,
}

/// GPU capabilities consumed by the presenter.
///
/// Creation calls may fail (they run during initialization or on frame size
/// changes); writes and draws are treated as infallible.
///
/// Several draws may be recorded into one target before it is submitted. Each
/// one must see the `color` passed with it and the vertex range it names.
pub trait Backend {
    type Program;
    type Buffer;
    type Texture;
    type Sampler;
    /// Per-frame destination of draws.
    type Target<'a>;

    /// Compiles and links a program. The error carries the compiler log.
    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<Self::Program>;
    fn destroy_program(&mut self, program: Self::Program);

    fn create_buffer(&mut self, desc: &BufferDesc<'_>) -> Result<Self::Buffer>;
    /// Overwrites `data.len()` bytes at `offset` without reallocating.
    fn write_buffer(&mut self, buffer: &Self::Buffer, offset: u64, data: &[u8]);
    fn destroy_buffer(&mut self, buffer: Self::Buffer);

    /// Allocates an RGBA8 texture of `size`. Contents are undefined.
    fn create_texture(&mut self, label: &str, size: Size) -> Result<Self::Texture>;
    /// Replaces the texture contents with tightly packed RGBA8 rows.
    fn write_texture(&mut self, texture: &Self::Texture, size: Size, rgba: &[u8]);
    fn destroy_texture(&mut self, texture: Self::Texture);

    fn create_sampler(&mut self, label: &str, filter: FilterMode) -> Self::Sampler;
    fn destroy_sampler(&mut self, sampler: Self::Sampler);

    fn draw(&mut self, target: &mut Self::Target<'_>, call: DrawCall<'_, Self>);
}
