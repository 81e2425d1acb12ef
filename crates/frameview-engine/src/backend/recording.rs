//! CPU-only backend that records every request.
//!
//! Intended for tests: it tracks live resources, keeps buffer and texture
//! contents, counts allocations and logs draws. Program, buffer and texture
//! creation can be made to fail by label.

use std::collections::BTreeMap;

use anyhow::{bail, Result};

use crate::coords::{Rect, Size};

use super::{Backend, Blend, BufferDesc, BufferKind, DrawCall, FilterMode, ProgramDesc, Topology};

/// Opaque handle handed out by [`RecordingBackend`].
///
/// Deliberately neither `Clone` nor `Copy`: the owner gives it back exactly once.
#[derive(Debug, PartialEq, Eq)]
pub struct Handle(u32);

/// Kind of a tracked resource.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Program,
    Buffer,
    Texture,
    Sampler,
}

/// Snapshot of one draw request.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub program: String,
    pub topology: Topology,
    pub vertex_offset: u64,
    pub vertex_count: u32,
    /// The drawn vertex range, as the buffer held it at the time of the draw.
    pub vertices: Vec<u8>,
    pub texture: Option<String>,
    pub color: Option<[f32; 4]>,
    pub viewport: Rect,
    pub blend: Blend,
}

#[derive(Debug)]
enum Resource {
    Program { label: String, topology: Topology, stride: u64 },
    Buffer { label: String, kind: BufferKind, bytes: Vec<u8> },
    Texture { label: String, size: Size, rgba: Vec<u8> },
    Sampler { label: String, filter: FilterMode },
}

impl Resource {
    fn kind(&self) -> ResourceKind {
        match self {
            Resource::Program { .. } => ResourceKind::Program,
            Resource::Buffer { .. } => ResourceKind::Buffer,
            Resource::Texture { .. } => ResourceKind::Texture,
            Resource::Sampler { .. } => ResourceKind::Sampler,
        }
    }

    fn label(&self) -> &str {
        match self {
            Resource::Program { label, .. }
            | Resource::Buffer { label, .. }
            | Resource::Texture { label, .. }
            | Resource::Sampler { label, .. } => label,
        }
    }
}

/// Recording [`Backend`]; draws go nowhere (`Target = ()`).
#[derive(Debug, Default)]
pub struct RecordingBackend {
    next_id: u32,
    live: BTreeMap<u32, Resource>,
    created: BTreeMap<ResourceKind, usize>,
    draws: Vec<DrawRecord>,
    buffer_writes: usize,
    texture_writes: usize,
    failing_programs: Vec<String>,
    failing_buffers: Vec<String>,
    failing_textures: Vec<String>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `create_program` fail for labels containing `pattern`.
    pub fn fail_programs_matching(mut self, pattern: &str) -> Self {
        self.failing_programs.push(pattern.to_string());
        self
    }

    /// Makes `create_buffer` fail for labels containing `pattern`.
    pub fn fail_buffers_matching(mut self, pattern: &str) -> Self {
        self.failing_buffers.push(pattern.to_string());
        self
    }

    /// Makes `create_texture` fail for labels containing `pattern`, as a
    /// device would for an image beyond its limits.
    pub fn fail_textures_matching(mut self, pattern: &str) -> Self {
        self.failing_textures.push(pattern.to_string());
        self
    }

    /// Number of resources created and not yet destroyed.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn live_count_of(&self, kind: ResourceKind) -> usize {
        self.live.values().filter(|r| r.kind() == kind).count()
    }

    /// Total number of successful creations of `kind` so far.
    pub fn created_count(&self, kind: ResourceKind) -> usize {
        self.created.get(&kind).copied().unwrap_or(0)
    }

    /// Labels of live resources, in creation order.
    pub fn live_labels(&self) -> Vec<&str> {
        self.live.values().map(Resource::label).collect()
    }

    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    pub fn clear_draws(&mut self) {
        self.draws.clear();
    }

    pub fn buffer_writes(&self) -> usize {
        self.buffer_writes
    }

    pub fn texture_writes(&self) -> usize {
        self.texture_writes
    }

    /// Contents of the live buffer labelled `label`.
    pub fn buffer_bytes(&self, label: &str) -> Option<&[u8]> {
        self.live.values().find_map(|r| match r {
            Resource::Buffer { label: l, bytes, .. } if l == label => Some(bytes.as_slice()),
            _ => None,
        })
    }

    /// Size and contents of the live texture labelled `label`.
    pub fn texture(&self, label: &str) -> Option<(Size, &[u8])> {
        self.live.values().find_map(|r| match r {
            Resource::Texture { label: l, size, rgba } if l == label => {
                Some((*size, rgba.as_slice()))
            }
            _ => None,
        })
    }

    /// Filter of the live sampler labelled `label`.
    pub fn sampler_filter(&self, label: &str) -> Option<FilterMode> {
        self.live.values().find_map(|r| match r {
            Resource::Sampler { label: l, filter } if l == label => Some(*filter),
            _ => None,
        })
    }

    fn insert(&mut self, resource: Resource) -> Handle {
        let id = self.next_id;
        self.next_id += 1;
        *self.created.entry(resource.kind()).or_insert(0) += 1;
        self.live.insert(id, resource);
        Handle(id)
    }

    fn remove(&mut self, handle: Handle, kind: ResourceKind) {
        match self.live.remove(&handle.0) {
            Some(r) if r.kind() == kind => {}
            Some(r) => panic!("handle {} is a {:?}, destroyed as {kind:?}", handle.0, r.kind()),
            None => panic!("handle {} destroyed twice or never created", handle.0),
        }
    }

    fn label_of(&self, handle: &Handle) -> String {
        self.live
            .get(&handle.0)
            .map(|r| r.label().to_string())
            .unwrap_or_else(|| format!("<dead #{}>", handle.0))
    }
}

impl Backend for RecordingBackend {
    type Program = Handle;
    type Buffer = Handle;
    type Texture = Handle;
    type Sampler = Handle;
    type Target<'a> = ();

    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<Handle> {
        if self.failing_programs.iter().any(|p| desc.label.contains(p.as_str())) {
            bail!("{}: link failed: injected failure", desc.label);
        }
        Ok(self.insert(Resource::Program {
            label: desc.label.to_string(),
            topology: desc.topology,
            stride: desc.layout.stride,
        }))
    }

    fn destroy_program(&mut self, program: Handle) {
        self.remove(program, ResourceKind::Program);
    }

    fn create_buffer(&mut self, desc: &BufferDesc<'_>) -> Result<Handle> {
        if self.failing_buffers.iter().any(|p| desc.label.contains(p.as_str())) {
            bail!("{}: buffer allocation failed: injected failure", desc.label);
        }
        let mut bytes = vec![0u8; desc.capacity as usize];
        if let Some(contents) = desc.contents {
            let n = contents.len().min(bytes.len());
            bytes[..n].copy_from_slice(&contents[..n]);
        }
        Ok(self.insert(Resource::Buffer {
            label: desc.label.to_string(),
            kind: desc.kind,
            bytes,
        }))
    }

    fn write_buffer(&mut self, buffer: &Handle, offset: u64, data: &[u8]) {
        self.buffer_writes += 1;
        if let Some(Resource::Buffer { bytes, .. }) = self.live.get_mut(&buffer.0) {
            let start = offset as usize;
            let end = start + data.len();
            assert!(end <= bytes.len(), "write {start}..{end} past buffer end {}", bytes.len());
            bytes[start..end].copy_from_slice(data);
        }
    }

    fn destroy_buffer(&mut self, buffer: Handle) {
        self.remove(buffer, ResourceKind::Buffer);
    }

    fn create_texture(&mut self, label: &str, size: Size) -> Result<Handle> {
        if self.failing_textures.iter().any(|p| label.contains(p.as_str())) {
            bail!(
                "{label}: texture {}x{} exceeds device limits: injected failure",
                size.width,
                size.height
            );
        }
        let len = size.area().map(|n| n * 4);
        let Some(len) = len else { bail!("{label}: texture {size:?} too large") };
        Ok(self.insert(Resource::Texture {
            label: label.to_string(),
            size,
            rgba: vec![0u8; len],
        }))
    }

    fn write_texture(&mut self, texture: &Handle, size: Size, rgba: &[u8]) {
        self.texture_writes += 1;
        if let Some(Resource::Texture { size: tex_size, rgba: stored, .. }) =
            self.live.get_mut(&texture.0)
        {
            assert_eq!(*tex_size, size, "sub-image write must cover the allocated size");
            assert_eq!(stored.len(), rgba.len(), "upload length mismatch");
            stored.copy_from_slice(rgba);
        }
    }

    fn destroy_texture(&mut self, texture: Handle) {
        self.remove(texture, ResourceKind::Texture);
    }

    fn create_sampler(&mut self, label: &str, filter: FilterMode) -> Handle {
        self.insert(Resource::Sampler { label: label.to_string(), filter })
    }

    fn destroy_sampler(&mut self, sampler: Handle) {
        self.remove(sampler, ResourceKind::Sampler);
    }

    fn draw(&mut self, _target: &mut (), call: DrawCall<'_, Self>) {
        let (program, topology, stride) = match self.live.get(&call.program.0) {
            Some(Resource::Program { label, topology, stride }) => {
                (label.clone(), *topology, *stride)
            }
            _ => panic!("draw with a dead program handle #{}", call.program.0),
        };
        let vertices = match self.live.get(&call.vertices.0) {
            Some(Resource::Buffer { label, kind: BufferKind::Vertex, bytes }) => {
                let start = call.vertex_offset as usize;
                let end = start + call.vertex_count as usize * stride as usize;
                assert!(
                    end <= bytes.len(),
                    "`{label}`: vertex range {start}..{end} past buffer end {}",
                    bytes.len()
                );
                bytes[start..end].to_vec()
            }
            Some(Resource::Buffer { label, kind, .. }) => {
                panic!("`{label}` is a {kind:?} buffer, drawn as vertices")
            }
            _ => panic!("draw with a dead buffer handle #{}", call.vertices.0),
        };
        let texture = call.texture.map(|(t, _)| self.label_of(t));

        self.draws.push(DrawRecord {
            program,
            topology,
            vertex_offset: call.vertex_offset,
            vertex_count: call.vertex_count,
            vertices,
            texture,
            color: call.color,
            viewport: call.viewport,
            blend: call.blend,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BufferUsage, ProgramInputs};
    use crate::geometry::{VertexAttribute, VertexFormat, VertexLayout};

    fn buffer_desc<'a>(label: &'a str, contents: Option<&'a [u8]>) -> BufferDesc<'a> {
        BufferDesc {
            label,
            kind: BufferKind::Vertex,
            usage: BufferUsage::Dynamic,
            capacity: 8,
            contents,
        }
    }

    const POINT_ATTRS: [VertexAttribute; 1] = [VertexAttribute {
        name: "pos",
        location: 0,
        format: VertexFormat::Float32x2,
        offset: 0,
    }];

    /// Program with a 2-byte stride, so each vertex covers two buffer bytes.
    fn tiny_program(b: &mut RecordingBackend) -> Handle {
        b.create_program(&ProgramDesc {
            label: "points",
            source: "",
            layout: VertexLayout { stride: 2, attributes: &POINT_ATTRS },
            topology: Topology::TriangleList,
            inputs: ProgramInputs::Color,
        })
        .unwrap()
    }

    fn draw_call<'a>(
        program: &'a Handle,
        vertices: &'a Handle,
        offset: u64,
    ) -> DrawCall<'a, RecordingBackend> {
        DrawCall {
            program,
            vertices,
            vertex_offset: offset,
            vertex_count: 2,
            texture: None,
            color: Some([1.0; 4]),
            viewport: Rect::new(0.0, 0.0, 4.0, 4.0),
            blend: Blend::Replace,
        }
    }

    #[test]
    fn tracks_live_resources() {
        let mut b = RecordingBackend::new();
        let buf = b.create_buffer(&buffer_desc("a", Some(&[1, 2, 3]))).unwrap();
        let smp = b.create_sampler("s", FilterMode::Linear);
        assert_eq!(b.live_count(), 2);
        assert_eq!(b.buffer_bytes("a"), Some(&[1, 2, 3, 0, 0, 0, 0, 0][..]));
        assert_eq!(b.sampler_filter("s"), Some(FilterMode::Linear));

        b.destroy_buffer(buf);
        b.destroy_sampler(smp);
        assert_eq!(b.live_count(), 0);
        assert_eq!(b.created_count(ResourceKind::Buffer), 1);
    }

    #[test]
    fn writes_land_at_offset() {
        let mut b = RecordingBackend::new();
        let buf = b.create_buffer(&buffer_desc("a", None)).unwrap();
        b.write_buffer(&buf, 4, &[9, 9]);
        assert_eq!(b.buffer_bytes("a"), Some(&[0, 0, 0, 0, 9, 9, 0, 0][..]));
        assert_eq!(b.buffer_writes(), 1);
        b.destroy_buffer(buf);
    }

    #[test]
    fn injected_failures_match_by_label() {
        let mut b = RecordingBackend::new().fail_buffers_matching("marker");
        assert!(b.create_buffer(&buffer_desc("marker vertices", None)).is_err());
        assert!(b.create_buffer(&buffer_desc("quad vertices", None)).is_ok());
        assert_eq!(b.live_count(), 1);
    }

    #[test]
    fn draw_records_only_its_vertex_range() {
        let mut b = RecordingBackend::new();
        let program = tiny_program(&mut b);
        let contents = [1, 2, 3, 4, 5, 6, 7, 8];
        let buf = b.create_buffer(&buffer_desc("v", Some(&contents))).unwrap();

        b.draw(&mut (), draw_call(&program, &buf, 4));
        assert_eq!(b.draws()[0].vertex_offset, 4);
        assert_eq!(b.draws()[0].vertices, vec![5, 6, 7, 8]);

        b.clear_draws();
        assert!(b.draws().is_empty());
    }

    #[test]
    #[should_panic(expected = "past buffer end")]
    fn draw_past_buffer_end_panics() {
        let mut b = RecordingBackend::new();
        let program = tiny_program(&mut b);
        let buf = b.create_buffer(&buffer_desc("v", None)).unwrap();
        b.draw(&mut (), draw_call(&program, &buf, 6));
    }

    #[test]
    #[should_panic(expected = "drawn as vertices")]
    fn drawing_from_an_index_buffer_panics() {
        let mut b = RecordingBackend::new();
        let program = tiny_program(&mut b);
        let desc = BufferDesc { kind: BufferKind::Index, ..buffer_desc("i", None) };
        let buf = b.create_buffer(&desc).unwrap();
        b.draw(&mut (), draw_call(&program, &buf, 0));
    }

    #[test]
    #[should_panic(expected = "destroyed as")]
    fn destroying_with_wrong_kind_panics() {
        let mut b = RecordingBackend::new();
        let smp = b.create_sampler("s", FilterMode::Nearest);
        b.destroy_buffer(smp);
    }
}
