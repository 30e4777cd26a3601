//! Quad batching.
//!
//! A [`QuadBatch`] owns one program and up to two shader cores (textured and flat color),
//! each with its own vertex and index buffers. Geometry accumulates in the active core and
//! reaches the GPU only when the paint state is about to change, the target changes, or a
//! primitive would not fit.

use crate::transform::Transform2D;

use super::backend::{
    Backend, BatchSource, BatchUniforms, BufferKind, CoreKind, DrawCall, FramebufferHandle,
    ProgramHandle, QuadVertex, ScissorRect, TextureHandle,
};
use super::buffer::GrowableBuffer;
use super::Stats;

const QUAD_INDICES: [u16; 6] = [0, 1, 2, 1, 3, 2];

/// Identifies a batch created by a [`GlContext`](super::GlContext).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BatchId(pub(crate) usize);

/// Where flushed geometry lands.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Target {
    pub framebuffer: FramebufferHandle,
    pub width: u32,
    pub height: u32,
    pub scissor: Option<ScissorRect>,
}

/// The state geometry is drawn with. Any change flushes what was queued under the old one.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct PaintState {
    pub texture: Option<TextureHandle>,
    pub color: [f32; 4],
}

struct Core {
    vertices: GrowableBuffer<QuadVertex>,
    indices: GrowableBuffer<u16>,
}

impl Core {
    fn new(backend: &mut dyn Backend, quads: usize, max_vertices: usize) -> Self {
        let quads = quads.min(max_vertices / 4).max(1);
        let (verts, elems) = (quads * 4, quads * 6);
        let vb = backend.create_buffer(BufferKind::Vertex, vertex_bytes(verts));
        let ib = backend.create_buffer(BufferKind::Index, index_bytes(elems));
        Self {
            vertices: GrowableBuffer::new(vb, verts),
            indices: GrowableBuffer::new(ib, elems),
        }
    }
}

fn vertex_bytes(count: usize) -> u64 {
    (count * std::mem::size_of::<QuadVertex>()) as u64
}

fn index_bytes(count: usize) -> u64 {
    // index uploads are padded to four bytes
    (count.div_ceil(2) * 4) as u64
}

pub(crate) struct QuadBatch {
    source: BatchSource,
    program: Option<ProgramHandle>,
    cores: [Option<Core>; 2],
    active: Option<CoreKind>,
    paint: Option<PaintState>,
    initial_quads: usize,
    max_vertices: usize,
}

impl QuadBatch {
    pub(crate) fn new(source: BatchSource, initial_quads: usize, max_vertices: usize) -> Self {
        Self {
            source,
            program: None,
            cores: [None, None],
            active: None,
            paint: None,
            initial_quads,
            max_vertices,
        }
    }

    /// Select the core and paint state for the geometry that follows.
    ///
    /// Pending geometry is flushed first whenever the core or the paint state changes, so
    /// it is always drawn with the state it was queued under.
    pub(crate) fn prepare(
        &mut self,
        backend: &mut dyn Backend,
        target: &Target,
        stats: &mut Stats,
        kind: CoreKind,
        state: PaintState,
    ) {
        let switching = self.active != Some(kind);
        if switching || self.paint != Some(state) {
            self.flush(backend, target, stats);
        }
        if switching {
            if self.program.is_none() {
                self.program = Some(backend.create_program(&self.source));
                stats.shader_creates += 1;
                log::debug!("created batch program");
            }
            if self.cores[kind.index()].is_none() {
                self.cores[kind.index()] = Some(Core::new(backend, self.initial_quads, self.max_vertices));
            }
            self.active = Some(kind);
            stats.shader_binds += 1;
        }
        if state.texture.is_some() && self.paint.map(|p| p.texture) != Some(state.texture) {
            stats.texture_binds += 1;
        }
        self.paint = Some(state);
    }

    /// Forget the paint state so the next `prepare` starts fresh; called when the batch
    /// stops being the active one.
    pub(crate) fn deactivate(
        &mut self,
        backend: &mut dyn Backend,
        target: &Target,
        stats: &mut Stats,
    ) {
        self.flush(backend, target, stats);
        self.active = None;
        self.paint = None;
    }

    /// Make room for a primitive, returning the index of its first vertex.
    ///
    /// If the primitive does not fit behind the pending geometry, that geometry is flushed
    /// and each buffer too small for pending plus incoming grows to at least that total,
    /// doubling where possible. Vertex buffers stop growing at the batch maximum, after
    /// which an overflow only flushes.
    fn begin_primitive(
        &mut self,
        backend: &mut dyn Backend,
        target: &Target,
        stats: &mut Stats,
        vertex_count: usize,
        index_count: usize,
    ) -> u16 {
        let Some(kind) = self.active else {
            panic!("geometry added before prepare_texture() or prepare_color()");
        };
        assert!(
            vertex_count <= self.max_vertices,
            "primitive with {vertex_count} vertices exceeds the batch maximum of {}",
            self.max_vertices
        );
        let Some(core) = self.cores[kind.index()].as_ref() else {
            unreachable!("prepare() creates the active core");
        };
        let needed_v = core.vertices.position() + vertex_count;
        let needed_i = core.indices.position() + index_count;
        if needed_v > core.vertices.capacity() || needed_i > core.indices.capacity() {
            self.flush(backend, target, stats);
            let max_vertices = self.max_vertices;
            if let Some(core) = self.cores[kind.index()].as_mut() {
                let verts = core.vertices.capacity();
                let mut grown_v = verts;
                if verts < needed_v && verts < max_vertices {
                    grown_v = (verts * 2).max(needed_v).min(max_vertices);
                    core.vertices.set_capacity(grown_v);
                    backend.resize_buffer(core.vertices.handle(), vertex_bytes(grown_v));
                    log::debug!("grew vertex buffer to {grown_v} vertices");
                }
                // at the vertex cap only the incoming primitive needs index room
                let needed_i = if grown_v < needed_v { index_count } else { needed_i };
                let elems = core.indices.capacity();
                if elems < needed_i {
                    let grown = (elems * 2).max(needed_i);
                    core.indices.set_capacity(grown);
                    backend.resize_buffer(core.indices.handle(), index_bytes(grown));
                    log::debug!("grew index buffer to {grown} indices");
                }
            }
        }
        match &self.cores[kind.index()] {
            Some(core) => core.vertices.position() as u16,
            None => unreachable!("prepare() creates the active core"),
        }
    }

    fn active_core(&mut self) -> &mut Core {
        match self.active.and_then(|kind| self.cores[kind.index()].as_mut()) {
            Some(core) => core,
            None => unreachable!("begin_primitive() checked the active core"),
        }
    }

    /// Queue an axis-aligned quad (in local coordinates) mapped through `xf`.
    pub(crate) fn add_quad(
        &mut self,
        backend: &mut dyn Backend,
        target: &Target,
        stats: &mut Stats,
        xf: &Transform2D,
        [x0, y0, x1, y1]: [f32; 4],
        [s0, t0, s1, t1]: [f32; 4],
    ) {
        let base = self.begin_primitive(backend, target, stats, 4, 6);
        let core = self.active_core();
        for (x, y, s, t) in [(x0, y0, s0, t0), (x1, y0, s1, t0), (x0, y1, s0, t1), (x1, y1, s1, t1)] {
            let (px, py) = xf.transform_point(x, y);
            core.vertices.push(QuadVertex::new(px, py, s, t));
        }
        for index in QUAD_INDICES {
            core.indices.push(base + index);
        }
        stats.quads_rendered += 1;
    }

    /// Queue indexed triangles. `xys` holds interleaved local positions; `uvs` (same
    /// layout) defaults to zero texture coordinates.
    ///
    /// # Panics
    ///
    /// Panics if `xys` has odd length, if `uvs` and `xys` differ in length, or if an index
    /// is out of range.
    pub(crate) fn add_triangles(
        &mut self,
        backend: &mut dyn Backend,
        target: &Target,
        stats: &mut Stats,
        xf: &Transform2D,
        xys: &[f32],
        uvs: Option<&[f32]>,
        indices: &[u16],
    ) {
        assert!(xys.len() % 2 == 0, "positions must come in x, y pairs");
        if let Some(uvs) = uvs {
            assert_eq!(uvs.len(), xys.len(), "one texture coordinate per vertex");
        }
        let vertex_count = xys.len() / 2;
        assert!(
            indices.iter().all(|&i| (i as usize) < vertex_count),
            "triangle index out of range"
        );
        if indices.is_empty() {
            return;
        }
        let base = self.begin_primitive(backend, target, stats, vertex_count, indices.len());
        let core = self.active_core();
        for (ii, xy) in xys.chunks_exact(2).enumerate() {
            let (px, py) = xf.transform_point(xy[0], xy[1]);
            let (s, t) = uvs.map_or((0.0, 0.0), |uv| (uv[ii * 2], uv[ii * 2 + 1]));
            core.vertices.push(QuadVertex::new(px, py, s, t));
        }
        for &index in indices {
            core.indices.push(base + index);
        }
        stats.triangles_rendered += (indices.len() / 3) as u64;
    }

    /// Draw everything queued in the active core. Does nothing when nothing is queued.
    pub(crate) fn flush(&mut self, backend: &mut dyn Backend, target: &Target, stats: &mut Stats) {
        let Some(kind) = self.active else {
            return;
        };
        let Some(core) = self.cores[kind.index()].as_mut() else {
            return;
        };
        if core.indices.is_empty() {
            return;
        }
        let (Some(program), Some(paint)) = (self.program, self.paint) else {
            core.vertices.reset();
            core.indices.reset();
            return;
        };
        log::trace!(
            "flushing {} indices ({:?}) to {:?}",
            core.indices.position(),
            kind,
            target.framebuffer
        );
        backend.draw(&DrawCall {
            program,
            core: kind,
            vertex_buffer: core.vertices.handle(),
            index_buffer: core.indices.handle(),
            vertices: core.vertices.as_slice(),
            indices: core.indices.as_slice(),
            texture: paint.texture,
            uniforms: BatchUniforms {
                viewport: [target.width as f32, target.height as f32],
                _pad: [0.0; 2],
                color: paint.color,
            },
            framebuffer: target.framebuffer,
            scissor: target.scissor,
        });
        core.vertices.reset();
        core.indices.reset();
        stats.shader_flushes += 1;
    }

    pub(crate) fn pending_indices(&self) -> usize {
        self.active
            .and_then(|kind| self.cores[kind.index()].as_ref())
            .map_or(0, |core| core.indices.position())
    }

    /// Release every GPU object the batch created.
    pub(crate) fn destroy(&mut self, backend: &mut dyn Backend) {
        for core in self.cores.iter_mut().filter_map(Option::take) {
            backend.delete_buffer(core.vertices.handle());
            backend.delete_buffer(core.indices.handle());
        }
        if let Some(program) = self.program.take() {
            backend.delete_program(program);
        }
        self.active = None;
        self.paint = None;
    }
}
