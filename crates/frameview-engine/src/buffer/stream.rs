use anyhow::{Context, Result};

use crate::backend::{Backend, BufferDesc, BufferKind, BufferUsage};

/// Fixed-capacity GPU buffer with a CPU-side fill cursor.
///
/// The GPU allocation happens once in [`create`](Self::create); afterwards
/// data is streamed in with partial writes. [`reset`](Self::reset) rewinds the
/// cursor without freeing, so per-frame geometry reuses the same memory.
pub struct StreamBuffer<B: Backend> {
    buffer: B::Buffer,
    kind: BufferKind,
    usage: BufferUsage,
    capacity: u64,
    size: u64,
}

impl<B: Backend> StreamBuffer<B> {
    /// Allocates `capacity` bytes, optionally seeding the start with `initial`.
    ///
    /// `size()` starts at `initial.len()`.
    pub fn create(
        backend: &mut B,
        label: &str,
        kind: BufferKind,
        usage: BufferUsage,
        capacity: u64,
        initial: Option<&[u8]>,
    ) -> Result<Self> {
        let initial_len = initial.map_or(0, |d| d.len() as u64);
        anyhow::ensure!(
            initial_len <= capacity,
            "{label}: initial data ({initial_len} bytes) exceeds capacity ({capacity} bytes)"
        );

        let buffer = backend
            .create_buffer(&BufferDesc { label, kind, usage, capacity, contents: initial })
            .with_context(|| format!("failed to create stream buffer `{label}`"))?;

        Ok(Self { buffer, kind, usage, capacity, size: initial_len })
    }

    /// Overwrites `data.len()` bytes at `offset`.
    ///
    /// Out-of-range writes are dropped with a warning. The fill cursor grows to
    /// cover the written range.
    pub fn update(&mut self, backend: &mut B, offset: u64, data: &[u8]) {
        let end = offset.saturating_add(data.len() as u64);
        if end > self.capacity {
            log::warn!(
                "StreamBuffer: write {offset}..{end} exceeds capacity {}; dropped",
                self.capacity
            );
            return;
        }
        if data.is_empty() {
            return;
        }
        backend.write_buffer(&self.buffer, offset, data);
        self.size = self.size.max(end);
    }

    /// Writes `data` at the fill cursor and advances it.
    ///
    /// Returns `false`, writing nothing, when the data does not fit.
    pub fn append(&mut self, backend: &mut B, data: &[u8]) -> bool {
        let len = data.len() as u64;
        if self.size.saturating_add(len) > self.capacity {
            return false;
        }
        if len > 0 {
            backend.write_buffer(&self.buffer, self.size, data);
            self.size += len;
        }
        true
    }

    /// Rewinds the fill cursor; the GPU allocation is kept.
    pub fn reset(&mut self) {
        self.size = 0;
    }

    /// Releases the GPU allocation.
    pub fn destroy(self, backend: &mut B) {
        backend.destroy_buffer(self.buffer);
    }

    /// Backend handle, for binding as a draw's vertex source.
    pub fn handle(&self) -> &B::Buffer {
        &self.buffer
    }

    /// Bytes written since creation or the last reset.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }
}
