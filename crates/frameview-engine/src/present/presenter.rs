use anyhow::Result;

use crate::backend::{
    Backend, Blend, BufferKind, BufferUsage, DrawCall, FilterMode, ProgramDesc, ProgramInputs,
    Topology,
};
use crate::buffer::StreamBuffer;
use crate::coords::{ColorRgb, Rect, Size, Vec2};
use crate::geometry::{
    compute_marker, compute_quad, MarkerVertex, QuadVertex, MARKER_VERTEX_COUNT, QUAD_VERTEX_COUNT,
};
use crate::pixels::argb_to_rgba_into;

use super::{PresenterConfig, MARKER_SHADER, PRESENT_SHADER};

const MAIN_PROGRAM: &str = "frameview present";
const QUAD_BUFFER: &str = "frameview quad vertices";
const FRAME_SAMPLER: &str = "frameview frame sampler";
const FRAME_TEXTURE: &str = "frameview frame";
const MARKER_PROGRAM: &str = "frameview marker";
const MARKER_BUFFER: &str = "frameview marker vertices";

const QUAD_BYTES: u64 = (QUAD_VERTEX_COUNT as usize * std::mem::size_of::<QuadVertex>()) as u64;
const MARKER_BYTES: u64 =
    (MARKER_VERTEX_COUNT as usize * std::mem::size_of::<MarkerVertex>()) as u64;
/// Overlays per submit that keep their own geometry; the ring wraps after that.
const MARKER_SLOTS: u64 = 64;

/// Resources of the main image draw. Created and released as a unit.
struct MainPass<B: Backend> {
    program: B::Program,
    quad: StreamBuffer<B>,
    sampler: B::Sampler,
}

impl<B: Backend> MainPass<B> {
    fn create(backend: &mut B, filter: FilterMode, quad: &[QuadVertex; 4]) -> Result<Self> {
        let program = backend.create_program(&ProgramDesc {
            label: MAIN_PROGRAM,
            source: PRESENT_SHADER,
            layout: QuadVertex::LAYOUT,
            topology: Topology::TriangleStrip,
            inputs: ProgramInputs::Texture,
        })?;

        let quad = match StreamBuffer::create(
            backend,
            QUAD_BUFFER,
            BufferKind::Vertex,
            BufferUsage::Dynamic,
            QUAD_BYTES,
            Some(bytemuck::cast_slice(quad)),
        ) {
            Ok(quad) => quad,
            Err(e) => {
                backend.destroy_program(program);
                return Err(e);
            }
        };

        let sampler = backend.create_sampler(FRAME_SAMPLER, filter);

        Ok(Self { program, quad, sampler })
    }

    fn release(self, backend: &mut B) {
        backend.destroy_sampler(self.sampler);
        self.quad.destroy(backend);
        backend.destroy_program(self.program);
    }
}

/// Resources of the crosshair overlay.
struct MarkerPass<B: Backend> {
    program: B::Program,
    vertices: StreamBuffer<B>,
}

impl<B: Backend> MarkerPass<B> {
    fn create(backend: &mut B) -> Result<Self> {
        let program = backend.create_program(&ProgramDesc {
            label: MARKER_PROGRAM,
            source: MARKER_SHADER,
            layout: MarkerVertex::LAYOUT,
            topology: Topology::TriangleList,
            inputs: ProgramInputs::Color,
        })?;

        let vertices = match StreamBuffer::create(
            backend,
            MARKER_BUFFER,
            BufferKind::Vertex,
            BufferUsage::Dynamic,
            MARKER_BYTES * MARKER_SLOTS,
            None,
        ) {
            Ok(vertices) => vertices,
            Err(e) => {
                backend.destroy_program(program);
                return Err(e);
            }
        };

        Ok(Self { program, vertices })
    }

    fn release(self, backend: &mut B) {
        self.vertices.destroy(backend);
        backend.destroy_program(self.program);
    }
}

/// The frame image; its size is the current source size.
struct FrameTexture<B: Backend> {
    texture: B::Texture,
    size: Size,
}

/// Shows a CPU-rendered ARGB frame on a GPU target, letterboxed to the output,
/// with an optional crosshair overlay.
///
/// Lifecycle: [`init`](Self::init) → per-frame calls → [`shutdown`](Self::shutdown).
/// Every draw and upload before `init` (or after `shutdown`) is a no-op.
/// `init` may be called again after `shutdown`, or on a ready presenter, which
/// shuts it down first.
///
/// Owned handles move into the backend's `destroy_*` calls, so each resource is
/// released exactly once. Dropping the presenter drops the backend with it;
/// call `shutdown` first when the backend's device outlives it.
pub struct Presenter<B: Backend> {
    backend: B,
    config: PresenterConfig,

    main: Option<MainPass<B>>,
    marker: Option<MarkerPass<B>>,
    frame: Option<FrameTexture<B>>,

    output: Size,
    quad: [QuadVertex; 4],
    upload: Vec<u8>,
    texture_generation: u64,
}

impl<B: Backend> Presenter<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, PresenterConfig::default())
    }

    pub fn with_config(backend: B, config: PresenterConfig) -> Self {
        Self {
            backend,
            config,
            main: None,
            marker: None,
            frame: None,
            output: Size::zero(),
            quad: [QuadVertex::default(); 4],
            upload: Vec::new(),
            texture_generation: 0,
        }
    }

    /// Creates the programs, vertex buffers and sampler.
    ///
    /// Returns `false`, with nothing left allocated, when the main image
    /// resources cannot be created. An overlay failure only disables the
    /// overlay.
    pub fn init(&mut self) -> bool {
        if self.is_ready() {
            self.shutdown();
        }

        let main = match MainPass::create(&mut self.backend, self.config.filter, &self.quad) {
            Ok(main) => main,
            Err(e) => {
                log::error!("Presenter: init failed: {e:#}");
                return false;
            }
        };
        self.main = Some(main);

        if self.config.overlay {
            match MarkerPass::create(&mut self.backend) {
                Ok(marker) => self.marker = Some(marker),
                Err(e) => log::warn!("Presenter: overlay disabled: {e:#}"),
            }
        }

        log::debug!(
            "Presenter: ready (filter={:?}, overlay={})",
            self.config.filter,
            self.marker.is_some()
        );
        true
    }

    /// Releases every resource and forgets the output and source sizes.
    ///
    /// Safe to call repeatedly and before `init`.
    pub fn shutdown(&mut self) {
        if let Some(frame) = self.frame.take() {
            self.backend.destroy_texture(frame.texture);
        }
        if let Some(marker) = self.marker.take() {
            marker.release(&mut self.backend);
        }
        if let Some(main) = self.main.take() {
            main.release(&mut self.backend);
            log::debug!("Presenter: shut down");
        }

        self.output = Size::zero();
        self.quad = [QuadVertex::default(); 4];
        self.upload = Vec::new();
    }

    /// Sets the output size in pixels (clamped to at least 1×1) and refits the quad.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.output = Size::new(width, height).at_least_one();
        self.refresh_quad();
    }

    /// Switches between letterboxing and stretching.
    ///
    /// Applied by the next `resize` or size-changing frame.
    pub fn set_stretch(&mut self, stretch: bool) {
        self.config.stretch = stretch;
    }

    /// Converts and uploads one `width × height` frame of `0xAARRGGBB` pixels.
    ///
    /// Ignored before `init`, for zero dimensions, and when `pixels` holds
    /// fewer than `width * height` values. A new size reallocates the texture
    /// and refits the quad; otherwise the texture is updated in place.
    pub fn update_frame(&mut self, pixels: &[u32], width: u32, height: u32) {
        if self.main.is_none() {
            log::trace!("Presenter: frame before init; ignored");
            return;
        }

        let size = Size::new(width, height);
        let Some(count) = size.area().filter(|&n| n > 0 && pixels.len() >= n) else {
            log::trace!(
                "Presenter: frame {width}x{height} with {} pixels; ignored",
                pixels.len()
            );
            return;
        };

        if self.source_size() != size && !self.reallocate_texture(size) {
            return;
        }

        let Some(frame) = self.frame.as_ref() else { return };
        argb_to_rgba_into(&pixels[..count], &mut self.upload);
        self.backend.write_texture(&frame.texture, size, &self.upload);
    }

    /// Draws the frame quad over the whole output.
    ///
    /// `alpha_blend` selects straight-alpha source-over; otherwise the image
    /// replaces the target contents. Nothing is drawn before the first frame.
    pub fn render_main(&mut self, target: &mut B::Target<'_>, alpha_blend: bool) {
        let (Some(main), Some(frame)) = (self.main.as_ref(), self.frame.as_ref()) else {
            log::trace!("Presenter: nothing to present");
            return;
        };
        if self.output.is_empty() {
            return;
        }

        self.backend.draw(
            target,
            DrawCall {
                program: &main.program,
                vertices: main.quad.handle(),
                vertex_offset: 0,
                vertex_count: QUAD_VERTEX_COUNT,
                texture: Some((&frame.texture, &main.sampler)),
                color: None,
                viewport: Rect::from_size(self.output),
                blend: if alpha_blend { Blend::SourceOver } else { Blend::Replace },
            },
        );
    }

    /// Draws the crosshair pointing at `point` inside `viewport`.
    ///
    /// `point` is normalized to the viewport ((0,0) top-left, (1,1)
    /// bottom-right); `aspect` is the viewport's width over height. The marker
    /// is always alpha blended and fully opaque.
    ///
    /// Each call writes its vertices to the next free slot of a ring, so
    /// several overlays recorded before one submit keep their own positions.
    /// The ring holds 64 of them before it wraps.
    pub fn render_overlay(
        &mut self,
        target: &mut B::Target<'_>,
        point: Vec2,
        color: ColorRgb,
        aspect: f32,
        viewport: Rect,
    ) {
        let Some(marker) = self.marker.as_mut() else { return };
        if viewport.is_empty() || !viewport.is_finite() {
            log::trace!("Presenter: empty overlay viewport {viewport:?}");
            return;
        }
        if !(point.is_finite() && color.is_finite() && aspect.is_finite()) {
            log::trace!("Presenter: non-finite overlay input; skipped");
            return;
        }

        let vertices = compute_marker(point, aspect);
        if marker.vertices.size() + MARKER_BYTES > marker.vertices.capacity() {
            marker.vertices.reset();
        }
        let offset = marker.vertices.size();
        if !marker.vertices.append(&mut self.backend, bytemuck::cast_slice(&vertices)) {
            return;
        }

        self.backend.draw(
            target,
            DrawCall {
                program: &marker.program,
                vertices: marker.vertices.handle(),
                vertex_offset: offset,
                vertex_count: MARKER_VERTEX_COUNT,
                texture: None,
                color: Some(color.to_opaque_rgba()),
                viewport,
                blend: Blend::SourceOver,
            },
        );
    }

    pub fn is_ready(&self) -> bool {
        self.main.is_some()
    }

    /// Whether overlay resources exist (`false` after an overlay init failure).
    pub fn overlay_enabled(&self) -> bool {
        self.marker.is_some()
    }

    pub fn stretch(&self) -> bool {
        self.config.stretch
    }

    pub fn config(&self) -> &PresenterConfig {
        &self.config
    }

    pub fn output_size(&self) -> Size {
        self.output
    }

    /// Size of the last accepted frame (zero before the first one).
    pub fn source_size(&self) -> Size {
        self.frame.as_ref().map_or(Size::zero(), |f| f.size)
    }

    /// Last computed quad, as mirrored into the vertex buffer.
    pub fn quad_vertices(&self) -> &[QuadVertex; 4] {
        &self.quad
    }

    /// Incremented on every texture reallocation.
    pub fn texture_generation(&self) -> u64 {
        self.texture_generation
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Releases all resources and hands the backend back.
    pub fn into_backend(mut self) -> B {
        self.shutdown();
        self.backend
    }

    /// Replaces the frame texture with one of `size`. The old texture stays
    /// in place when allocation fails.
    fn reallocate_texture(&mut self, size: Size) -> bool {
        let texture = match self.backend.create_texture(FRAME_TEXTURE, size) {
            Ok(texture) => texture,
            Err(e) => {
                log::warn!("Presenter: frame {}x{} rejected: {e:#}", size.width, size.height);
                return false;
            }
        };

        if let Some(old) = self.frame.replace(FrameTexture { texture, size }) {
            self.backend.destroy_texture(old.texture);
        }
        self.texture_generation += 1;
        log::debug!(
            "Presenter: frame texture {}x{} (generation {})",
            size.width,
            size.height,
            self.texture_generation
        );

        self.refresh_quad();
        true
    }

    /// Recomputes the quad and mirrors it into the vertex buffer.
    fn refresh_quad(&mut self) {
        let source = self.source_size();
        let Some(quad) = compute_quad(self.output, source, self.config.stretch) else {
            return;
        };
        self.quad = quad;

        if let Some(main) = self.main.as_mut() {
            main.quad.update(&mut self.backend, 0, bytemuck::cast_slice(&self.quad));
        }
    }
}
