//! The batching GPU core.
//!
//! [`GlContext`] sits between [`Surface`](crate::surface::Surface) and a [`Backend`]. It
//! owns the batches, the current render target and scissor stack, texture creation and the
//! deferred destroy queue. Geometry is flushed to the backend only when something that
//! affects how it is drawn changes: the shader core, the texture or color, the batch, the
//! framebuffer, or the scissor rectangle.

mod backend;
mod batch;
mod buffer;
mod destroy;
mod gpu_context;
mod recording;
mod stats;
mod texture;
mod wgpu_backend;

use std::sync::Arc;

use image::RgbaImage;

use crate::transform::Transform2D;
use crate::types::{Color, NOOP_TINT};

pub use backend::{
    Backend, BatchSource, BatchUniforms, BufferHandle, BufferKind, CoreKind, DrawCall,
    FramebufferHandle, ProgramHandle, QuadVertex, ScissorRect, TextureHandle, DEFAULT_SHADER,
};
pub use batch::BatchId;
pub use destroy::{DestroyQueue, PendingDestroy};
pub use gpu_context::{GpuConfig, GpuContext, SurfaceState};
pub use recording::{Command, CommandLog, DrawRecord, RecordingBackend};
pub use stats::Stats;
pub use texture::{Canvas, Gradient, GradientFill, Texture, TextureConfig, GRADIENT_WIDTH};
pub use wgpu_backend::WgpuBackend;

use batch::{PaintState, QuadBatch, Target};

/// Largest vertex count a single flush can address with 16-bit indices.
pub const MAX_VERTICES: usize = 1 << 16;

/// Renderer tuning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RendererConfig {
    /// Quads a batch core can hold before its buffers first grow.
    pub initial_quads: usize,
    /// Upper bound on vertices per flush; at most [`MAX_VERTICES`].
    pub max_vertices: usize,
    /// Device pixels per logical pixel; the root surface transform scales by it.
    pub scale_factor: f32,
    pub clear_color: Color,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            initial_quads: 256,
            max_vertices: MAX_VERTICES,
            scale_factor: 1.0,
            clear_color: Color::BLACK,
        }
    }
}

impl RendererConfig {
    pub fn initial_quads(mut self, quads: usize) -> Self {
        self.initial_quads = quads.max(1);
        self
    }

    pub fn max_vertices(mut self, vertices: usize) -> Self {
        self.max_vertices = vertices.clamp(4, MAX_VERTICES);
        self
    }

    pub fn scale_factor(mut self, scale: f32) -> Self {
        self.scale_factor = scale;
        self
    }

    pub fn clear_color(mut self, color: Color) -> Self {
        self.clear_color = color;
        self
    }
}

struct SavedTarget {
    target: Target,
    scissors: Vec<ScissorRect>,
}

pub struct GlContext {
    backend: Box<dyn Backend>,
    config: RendererConfig,
    batches: Vec<Option<QuadBatch>>,
    active_batch: Option<BatchId>,
    target: Target,
    default_size: (u32, u32),
    saved: Option<SavedTarget>,
    scissors: Vec<ScissorRect>,
    destroys: Arc<DestroyQueue>,
    stats: Stats,
}

impl GlContext {
    pub fn new(backend: impl Backend + 'static, config: RendererConfig) -> Self {
        let default = QuadBatch::new(
            BatchSource::default(),
            config.initial_quads,
            config.max_vertices,
        );
        Self {
            backend: Box::new(backend),
            config,
            batches: vec![Some(default)],
            active_batch: None,
            target: Target {
                framebuffer: FramebufferHandle::DEFAULT,
                width: 0,
                height: 0,
                scissor: None,
            },
            default_size: (0, 0),
            saved: None,
            scissors: Vec::new(),
            destroys: Arc::new(DestroyQueue::default()),
            stats: Stats::default(),
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn scale_factor(&self) -> f32 {
        self.config.scale_factor
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    /// The queue dropped textures report to. Exposed so other threads can hold it.
    pub fn destroy_queue(&self) -> &Arc<DestroyQueue> {
        &self.destroys
    }

    /// Downcast the backend, e.g. to hand the wgpu backend a new frame view.
    pub fn backend_mut<T: Backend + 'static>(&mut self) -> Option<&mut T> {
        self.backend.as_any_mut().downcast_mut::<T>()
    }

    // -------------------------------------------------------------------------
    // Frames and targets
    // -------------------------------------------------------------------------

    /// Start a frame on the default framebuffer of the given size.
    ///
    /// Runs queued texture destroys, binds the default framebuffer and clears the scissor
    /// stack.
    pub fn begin_frame(&mut self, width: u32, height: u32) {
        self.process_pending_destroys();
        self.default_size = (width, height);
        self.saved = None;
        self.scissors.clear();
        self.bind_framebuffer(FramebufferHandle::DEFAULT, width, height);
        self.target.scissor = None;
    }

    /// Flush everything queued this frame.
    pub fn end_frame(&mut self) {
        self.flush();
    }

    /// Size of the default framebuffer as of the last [`begin_frame`](Self::begin_frame).
    pub fn default_size(&self) -> (u32, u32) {
        self.default_size
    }

    pub fn current_framebuffer(&self) -> FramebufferHandle {
        self.target.framebuffer
    }

    pub fn target_size(&self) -> (u32, u32) {
        (self.target.width, self.target.height)
    }

    /// Direct subsequent drawing at `framebuffer`. Pending geometry is flushed to the old
    /// target first.
    pub fn bind_framebuffer(&mut self, framebuffer: FramebufferHandle, width: u32, height: u32) {
        if self.target.framebuffer == framebuffer
            && self.target.width == width
            && self.target.height == height
        {
            return;
        }
        self.flush();
        self.target.framebuffer = framebuffer;
        self.target.width = width;
        self.target.height = height;
        self.stats.framebuffer_binds += 1;
    }

    pub fn bind_default_framebuffer(&mut self) {
        let (w, h) = self.default_size;
        self.bind_framebuffer(FramebufferHandle::DEFAULT, w, h);
    }

    /// Save the current target (and its scissor stack) and bind `framebuffer`.
    ///
    /// # Panics
    ///
    /// Panics if a target is already saved; only one level is supported.
    pub fn push_framebuffer(&mut self, framebuffer: FramebufferHandle, width: u32, height: u32) {
        assert!(
            self.saved.is_none(),
            "push_framebuffer() while a framebuffer is already pushed"
        );
        self.flush();
        self.saved = Some(SavedTarget {
            target: self.target,
            scissors: std::mem::take(&mut self.scissors),
        });
        self.target.scissor = None;
        self.bind_framebuffer(framebuffer, width, height);
    }

    /// Restore the target saved by [`push_framebuffer`](Self::push_framebuffer).
    ///
    /// # Panics
    ///
    /// Panics if nothing was pushed.
    pub fn pop_framebuffer(&mut self) {
        let Some(saved) = self.saved.take() else {
            panic!("pop_framebuffer() without a matching push_framebuffer()");
        };
        self.bind_framebuffer(saved.target.framebuffer, saved.target.width, saved.target.height);
        self.scissors = saved.scissors;
        self.target.scissor = saved.target.scissor;
    }

    /// Fill the current target with `color`.
    pub fn clear(&mut self, color: Color) {
        self.flush();
        self.backend.clear(self.target.framebuffer, color);
    }

    // -------------------------------------------------------------------------
    // Clipping
    // -------------------------------------------------------------------------

    /// Push a scissor rectangle, intersected with the enclosing one (or the target bounds).
    /// Returns false if the resulting clip is empty, in which case drawing can be skipped.
    /// Every call must be paired with [`end_clipped`](Self::end_clipped).
    pub fn start_clipped(&mut self, rect: ScissorRect) -> bool {
        self.flush();
        let bounds = ScissorRect::new(0, 0, self.target.width as i32, self.target.height as i32);
        let parent = self.scissors.last().copied().unwrap_or(bounds);
        let clip = rect.intersect(&parent);
        self.scissors.push(clip);
        self.target.scissor = Some(clip);
        !clip.is_empty()
    }

    /// Pop a scissor rectangle, restoring the enclosing one or disabling scissoring.
    ///
    /// # Panics
    ///
    /// Panics without a matching [`start_clipped`](Self::start_clipped).
    pub fn end_clipped(&mut self) {
        self.flush();
        assert!(
            self.scissors.pop().is_some(),
            "end_clipped() without a matching start_clipped()"
        );
        self.target.scissor = self.scissors.last().copied();
    }

    pub fn clip_depth(&self) -> usize {
        self.scissors.len()
    }

    // -------------------------------------------------------------------------
    // Batches and geometry
    // -------------------------------------------------------------------------

    /// The batch that draws everything without an explicit override.
    pub fn default_batch(&self) -> BatchId {
        BatchId(0)
    }

    /// Create a batch running a custom program.
    pub fn create_batch(&mut self, source: BatchSource) -> BatchId {
        let batch = QuadBatch::new(source, self.config.initial_quads, self.config.max_vertices);
        self.batches.push(Some(batch));
        BatchId(self.batches.len() - 1)
    }

    /// Release a custom batch and its GPU objects.
    ///
    /// # Panics
    ///
    /// Panics for the default batch.
    pub fn destroy_batch(&mut self, id: BatchId) {
        assert!(id != self.default_batch(), "the default batch cannot be destroyed");
        if self.active_batch == Some(id) {
            self.flush();
            self.active_batch = None;
        }
        if let Some(mut batch) = self.batches.get_mut(id.0).and_then(Option::take) {
            batch.destroy(self.backend.as_mut());
        }
    }

    fn activate(&mut self, id: BatchId) {
        if self.active_batch == Some(id) {
            return;
        }
        let Self {
            backend,
            batches,
            target,
            stats,
            active_batch,
            ..
        } = self;
        if let Some(previous) = active_batch.and_then(|prev| batches.get_mut(prev.0)?.as_mut()) {
            previous.deactivate(backend.as_mut(), target, stats);
        }
        assert!(
            batches.get(id.0).is_some_and(Option::is_some),
            "batch {id:?} has been destroyed"
        );
        *active_batch = Some(id);
    }

    fn with_active<R>(
        &mut self,
        f: impl FnOnce(&mut QuadBatch, &mut dyn Backend, &Target, &mut Stats) -> R,
    ) -> R {
        let Self {
            backend,
            batches,
            target,
            stats,
            active_batch,
            ..
        } = self;
        let batch = match active_batch.and_then(|id| batches.get_mut(id.0)?.as_mut()) {
            Some(batch) => batch,
            None => panic!("geometry added before prepare_texture() or prepare_color()"),
        };
        f(batch, backend.as_mut(), target, stats)
    }

    /// Make `batch` active and draw the following geometry with `texture` multiplied by
    /// `tint`.
    ///
    /// # Panics
    ///
    /// Panics if the texture has been destroyed.
    pub fn prepare_texture(&mut self, batch: BatchId, texture: &Texture, tint: u32) {
        assert!(
            !texture.is_destroyed(),
            "cannot draw with destroyed texture {:?}",
            texture.handle()
        );
        self.activate(batch);
        let state = PaintState {
            texture: Some(texture.handle()),
            color: Color::from_argb(tint).to_array(),
        };
        self.with_active(|b, backend, target, stats| {
            b.prepare(backend, target, stats, CoreKind::Texture, state)
        });
    }

    /// Make `batch` active and draw the following geometry in flat `color` (packed ARGB)
    /// multiplied by `tint`.
    pub fn prepare_color(&mut self, batch: BatchId, color: u32, tint: u32) {
        self.activate(batch);
        let combined = if tint == NOOP_TINT {
            color
        } else {
            crate::types::tint::combine(color, tint)
        };
        let state = PaintState {
            texture: None,
            color: Color::from_argb(combined).to_array(),
        };
        self.with_active(|b, backend, target, stats| {
            b.prepare(backend, target, stats, CoreKind::Color, state)
        });
    }

    /// Queue a quad `[x0, y0, x1, y1]` with texture coordinates `[s0, t0, s1, t1]`.
    ///
    /// # Panics
    ///
    /// Panics if no paint state was prepared.
    pub fn add_quad(&mut self, xf: &Transform2D, pos: [f32; 4], uv: [f32; 4]) {
        self.with_active(|b, backend, target, stats| {
            b.add_quad(backend, target, stats, xf, pos, uv)
        });
    }

    /// Queue indexed triangles; see [`Surface::fill_triangles`](crate::surface::Surface).
    ///
    /// # Panics
    ///
    /// Panics if no paint state was prepared, on malformed input, or if the primitive has
    /// more vertices than a batch can hold.
    pub fn add_triangles(
        &mut self,
        xf: &Transform2D,
        xys: &[f32],
        uvs: Option<&[f32]>,
        indices: &[u16],
    ) {
        self.with_active(|b, backend, target, stats| {
            b.add_triangles(backend, target, stats, xf, xys, uvs, indices)
        });
    }

    /// Draw everything queued in the active batch.
    pub fn flush(&mut self) {
        let Self {
            backend,
            batches,
            target,
            stats,
            active_batch,
            ..
        } = self;
        if let Some(batch) = active_batch.and_then(|id| batches.get_mut(id.0)?.as_mut()) {
            batch.flush(backend.as_mut(), target, stats);
        }
    }

    /// Indices queued in the active batch and not yet flushed.
    pub fn pending_indices(&self) -> usize {
        self.active_batch
            .and_then(|id| self.batches.get(id.0)?.as_ref())
            .map_or(0, QuadBatch::pending_indices)
    }

    // -------------------------------------------------------------------------
    // Textures
    // -------------------------------------------------------------------------

    /// Allocate an empty texture.
    pub fn create_texture(&mut self, width: u32, height: u32, config: TextureConfig) -> Texture {
        let handle = self.backend.create_texture(width, height, &config, false);
        self.stats.texture_creates += 1;
        log::debug!("created texture {handle:?} ({width}x{height})");
        Texture::new(handle, None, width, height, config, self.destroys.clone())
    }

    /// Replace a texture's pixels.
    ///
    /// # Panics
    ///
    /// Panics if `rgba` is not `width * height * 4` bytes.
    pub fn upload(&mut self, texture: &Texture, rgba: &[u8]) {
        let (w, h) = (texture.width(), texture.height());
        assert_eq!(
            rgba.len(),
            (w * h * 4) as usize,
            "pixel data does not match a {w}x{h} texture"
        );
        self.backend.update_texture(texture.handle(), w, h, rgba);
    }

    pub fn create_texture_from_image(&mut self, image: &RgbaImage, config: TextureConfig) -> Texture {
        self.create_texture_from_canvas(image, config)
    }

    /// Snapshot a canvas into a new texture.
    pub fn create_texture_from_canvas(&mut self, canvas: &dyn Canvas, config: TextureConfig) -> Texture {
        let texture = self.create_texture(canvas.width(), canvas.height(), config);
        self.upload(&texture, canvas.rgba());
        texture
    }

    /// Allocate a texture together with a framebuffer rendering into it.
    pub fn create_render_target(&mut self, width: u32, height: u32, config: TextureConfig) -> Texture {
        let handle = self.backend.create_texture(width, height, &config, true);
        let framebuffer = self.backend.create_framebuffer(handle);
        self.stats.texture_creates += 1;
        self.stats.framebuffer_creates += 1;
        log::debug!("created render target {handle:?} / {framebuffer:?} ({width}x{height})");
        Texture::new(
            handle,
            Some(framebuffer),
            width,
            height,
            config,
            self.destroys.clone(),
        )
    }

    /// Rasterize a gradient into a clamp-to-edge strip texture.
    pub fn create_gradient(&mut self, gradient: Gradient) -> GradientFill {
        let strip = gradient.rasterize();
        let texture = self.create_texture_from_image(&strip, TextureConfig::default());
        GradientFill { gradient, texture }
    }

    /// Delete a texture (and its framebuffer) now. Queued geometry that may sample it is
    /// flushed first. Later draws with this texture panic; other references stay valid as
    /// handles but must not be drawn.
    pub fn destroy_texture(&mut self, texture: &Texture) {
        if !texture.mark_destroyed() {
            return;
        }
        self.flush();
        if let Some(fb) = texture.framebuffer() {
            if self.target.framebuffer == fb {
                log::warn!("destroying the bound framebuffer {fb:?}; rebinding the default");
                self.bind_default_framebuffer();
            }
            self.backend.delete_framebuffer(fb);
        }
        self.backend.delete_texture(texture.handle());
        log::debug!("destroyed texture {:?}", texture.handle());
    }

    /// Delete the GPU objects of textures whose last reference was dropped.
    pub fn process_pending_destroys(&mut self) {
        let pending = self.destroys.drain();
        if pending.is_empty() {
            return;
        }
        log::debug!("processing {} deferred destroys", pending.len());
        self.flush();
        for destroy in pending {
            if let Some(fb) = destroy.framebuffer {
                self.backend.delete_framebuffer(fb);
            }
            self.backend.delete_texture(destroy.texture);
        }
    }
}

impl std::fmt::Debug for GlContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlContext")
            .field("config", &self.config)
            .field("active_batch", &self.active_batch)
            .field("target", &self.target)
            .field("clip_depth", &self.scissors.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl Drop for GlContext {
    fn drop(&mut self) {
        for batch in self.batches.iter_mut().filter_map(Option::as_mut) {
            batch.destroy(self.backend.as_mut());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> (GlContext, CommandLog) {
        let (mut ctx, log) = GlContext::recording();
        ctx.begin_frame(100, 100);
        log.clear();
        (ctx, log)
    }

    fn quad(ctx: &mut GlContext) {
        ctx.add_quad(&Transform2D::IDENTITY, [0.0, 0.0, 10.0, 10.0], [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_same_state_batches_into_one_draw() {
        let (mut ctx, log) = ctx();
        let batch = ctx.default_batch();
        let tex = ctx.create_texture(4, 4, TextureConfig::default());
        for _ in 0..10 {
            ctx.prepare_texture(batch, &tex, NOOP_TINT);
            quad(&mut ctx);
        }
        ctx.end_frame();
        let draws = log.draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].indices.len(), 60);
        assert_eq!(ctx.stats().quads_rendered, 10);
        assert_eq!(ctx.stats().shader_flushes, 1);
    }

    #[test]
    fn test_state_change_flushes_with_old_state() {
        let (mut ctx, log) = ctx();
        let batch = ctx.default_batch();
        let a = ctx.create_texture(4, 4, TextureConfig::default());
        let b = ctx.create_texture(4, 4, TextureConfig::default());

        ctx.prepare_texture(batch, &a, NOOP_TINT);
        quad(&mut ctx);
        quad(&mut ctx);
        ctx.prepare_texture(batch, &b, NOOP_TINT);
        quad(&mut ctx);
        ctx.prepare_texture(batch, &b, 0x80FF_FFFF);
        quad(&mut ctx);
        ctx.prepare_color(batch, 0xFFFF_0000, NOOP_TINT);
        quad(&mut ctx);
        ctx.end_frame();

        let draws = log.draws();
        assert_eq!(draws.len(), 4);
        assert_eq!(draws[0].texture, Some(a.handle()));
        assert_eq!(draws[0].indices.len(), 12);
        assert_eq!(draws[1].texture, Some(b.handle()));
        assert_eq!(draws[1].color, [1.0; 4]);
        assert!((draws[2].color[3] - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(draws[3].core, CoreKind::Color);
        assert_eq!(draws[3].color, [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_flush_with_nothing_pending_is_noop() {
        let (mut ctx, log) = ctx();
        ctx.flush();
        ctx.prepare_color(ctx.default_batch(), 0xFFFF_FFFF, NOOP_TINT);
        ctx.flush();
        ctx.end_frame();
        assert!(log.draws().is_empty());
        assert_eq!(ctx.stats().shader_flushes, 0);
    }

    fn resizes(log: &CommandLog) -> usize {
        log.commands()
            .iter()
            .filter(|c| matches!(c, Command::ResizeBuffer { .. }))
            .count()
    }

    #[test]
    fn test_overflow_flushes_then_grows() {
        let (mut ctx, log) = GlContext::recording_with(RendererConfig::default().initial_quads(2));
        ctx.begin_frame(100, 100);
        log.clear();
        ctx.prepare_color(ctx.default_batch(), 0xFFFF_FFFF, NOOP_TINT);
        quad(&mut ctx);
        quad(&mut ctx);
        assert_eq!(ctx.pending_indices(), 12);
        assert_eq!(resizes(&log), 0);

        // the third quad flushes the first two, then the buffers grow
        quad(&mut ctx);
        let commands = log.commands();
        let first_draw = commands.iter().position(|c| matches!(c, Command::Draw(_)));
        let first_resize = commands
            .iter()
            .position(|c| matches!(c, Command::ResizeBuffer { .. }));
        assert!(matches!((first_draw, first_resize), (Some(draw), Some(resize)) if draw < resize));
        assert_eq!(ctx.pending_indices(), 6);

        for _ in 3..8 {
            quad(&mut ctx);
        }
        ctx.end_frame();
        assert_eq!(log.draws().len(), 3);
        assert_eq!(ctx.stats().quads_rendered, 8);

        // grown buffers hold a whole frame of the same geometry
        log.clear();
        ctx.begin_frame(100, 100);
        ctx.prepare_color(ctx.default_batch(), 0xFFFF_FFFF, NOOP_TINT);
        for _ in 0..8 {
            quad(&mut ctx);
        }
        ctx.end_frame();
        let draws = log.draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].indices.len(), 48);
        assert_eq!(resizes(&log), 0);
    }

    #[test]
    fn test_large_primitive_grows_past_pending() {
        let (mut ctx, log) = GlContext::recording_with(RendererConfig::default().initial_quads(2));
        ctx.begin_frame(100, 100);
        log.clear();
        ctx.prepare_color(ctx.default_batch(), 0xFFFF_FFFF, NOOP_TINT);
        quad(&mut ctx);

        let xys: Vec<f32> = (0..24).map(|i| i as f32).collect();
        let indices: Vec<u16> = (0..12).collect();
        ctx.add_triangles(&Transform2D::IDENTITY, &xys, None, &indices);
        assert_eq!(log.draws().len(), 1);
        assert_eq!(resizes(&log), 2);
        quad(&mut ctx);
        ctx.end_frame();

        let draws = log.draws();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[1].vertices.len(), 16);
        assert_eq!(draws[1].indices.len(), 18);
    }

    #[test]
    fn test_growth_stops_at_max_vertices() {
        let config = RendererConfig::default().initial_quads(1).max_vertices(8);
        let (mut ctx, log) = GlContext::recording_with(config);
        ctx.begin_frame(100, 100);
        log.clear();
        ctx.prepare_color(ctx.default_batch(), 0xFFFF_FFFF, NOOP_TINT);
        for _ in 0..3 {
            quad(&mut ctx);
        }
        ctx.end_frame();
        assert_eq!(log.draws().len(), 3);
        assert_eq!(resizes(&log), 2);

        log.clear();
        ctx.begin_frame(100, 100);
        ctx.prepare_color(ctx.default_batch(), 0xFFFF_FFFF, NOOP_TINT);
        for _ in 0..3 {
            quad(&mut ctx);
        }
        ctx.end_frame();
        assert_eq!(log.draws().len(), 2);
        assert_eq!(resizes(&log), 0);
    }

    #[test]
    #[should_panic(expected = "exceeds the batch maximum")]
    fn test_primitive_larger_than_max_panics() {
        let (mut ctx, _log) = GlContext::recording_with(RendererConfig::default().max_vertices(8));
        ctx.begin_frame(10, 10);
        ctx.prepare_color(ctx.default_batch(), 0xFFFF_FFFF, NOOP_TINT);
        let xys = vec![0.0; 20];
        ctx.add_triangles(&Transform2D::IDENTITY, &xys, None, &[0, 1, 2]);
    }

    #[test]
    #[should_panic(expected = "before prepare_texture")]
    fn test_geometry_without_prepare_panics() {
        let (mut ctx, _log) = ctx();
        quad(&mut ctx);
    }

    #[test]
    fn test_scissor_stack() {
        let (mut ctx, log) = ctx();
        let batch = ctx.default_batch();
        ctx.prepare_color(batch, 0xFFFF_FFFF, NOOP_TINT);
        quad(&mut ctx);
        assert!(ctx.start_clipped(ScissorRect::new(10, 10, 50, 50)));
        quad(&mut ctx);
        assert!(ctx.start_clipped(ScissorRect::new(40, 40, 50, 50)));
        quad(&mut ctx);
        ctx.end_clipped();
        quad(&mut ctx);
        ctx.end_clipped();
        quad(&mut ctx);
        ctx.end_frame();

        let scissors: Vec<_> = log.draws().iter().map(|d| d.scissor).collect();
        assert_eq!(
            scissors,
            vec![
                None,
                Some(ScissorRect::new(10, 10, 50, 50)),
                Some(ScissorRect::new(40, 40, 20, 20)),
                Some(ScissorRect::new(10, 10, 50, 50)),
                None,
            ]
        );
    }

    #[test]
    fn test_clip_outside_target_is_empty() {
        let (mut ctx, _log) = ctx();
        assert!(!ctx.start_clipped(ScissorRect::new(200, 0, 10, 10)));
        ctx.end_clipped();
        assert_eq!(ctx.clip_depth(), 0);
    }

    #[test]
    #[should_panic(expected = "without a matching start_clipped")]
    fn test_unbalanced_end_clipped_panics() {
        let (mut ctx, _log) = ctx();
        ctx.end_clipped();
    }

    #[test]
    fn test_framebuffer_change_flushes() {
        let (mut ctx, log) = ctx();
        let batch = ctx.default_batch();
        let target = ctx.create_render_target(32, 16, TextureConfig::default());
        let fb = target.framebuffer().unwrap();
        ctx.prepare_color(batch, 0xFFFF_FFFF, NOOP_TINT);
        quad(&mut ctx);
        ctx.push_framebuffer(fb, 32, 16);
        quad(&mut ctx);
        ctx.pop_framebuffer();
        quad(&mut ctx);
        ctx.end_frame();

        let draws = log.draws();
        assert_eq!(draws.len(), 3);
        assert_eq!(draws[0].framebuffer, FramebufferHandle::DEFAULT);
        assert_eq!((draws[1].framebuffer, draws[1].viewport), (fb, [32.0, 16.0]));
        assert_eq!(draws[2].framebuffer, FramebufferHandle::DEFAULT);
        assert_eq!(ctx.stats().framebuffer_creates, 1);
    }

    #[test]
    #[should_panic(expected = "already pushed")]
    fn test_double_push_panics() {
        let (mut ctx, _log) = ctx();
        ctx.push_framebuffer(FramebufferHandle(5), 1, 1);
        ctx.push_framebuffer(FramebufferHandle(6), 1, 1);
    }

    #[test]
    fn test_switching_batches_flushes() {
        let (mut ctx, log) = ctx();
        let custom = ctx.create_batch(BatchSource::wgsl("// custom"));
        let default = ctx.default_batch();
        ctx.prepare_color(default, 0xFFFF_FFFF, NOOP_TINT);
        quad(&mut ctx);
        ctx.prepare_color(custom, 0xFFFF_FFFF, NOOP_TINT);
        quad(&mut ctx);
        ctx.end_frame();
        let draws = log.draws();
        assert_eq!(draws.len(), 2);
        assert_ne!(draws[0].program, draws[1].program);
        assert_eq!(ctx.stats().shader_creates, 2);

        ctx.destroy_batch(custom);
        assert!(log
            .commands()
            .iter()
            .any(|c| *c == Command::DeleteProgram(draws[1].program)));
    }

    #[test]
    fn test_destroy_texture_flushes_first() {
        let (mut ctx, log) = ctx();
        let tex = ctx.create_render_target(4, 4, TextureConfig::default());
        ctx.prepare_texture(ctx.default_batch(), &tex, NOOP_TINT);
        quad(&mut ctx);
        ctx.destroy_texture(&tex);
        let commands = log.commands();
        let draw = commands.iter().position(|c| matches!(c, Command::Draw(_)));
        let delete = commands
            .iter()
            .position(|c| *c == Command::DeleteTexture(tex.handle()));
        assert!(draw.is_some() && delete.is_some());
        assert!(draw < delete);
        assert!(commands
            .iter()
            .any(|c| matches!(c, Command::DeleteFramebuffer(_))));
        assert!(tex.is_destroyed());
        drop(tex);
        assert!(ctx.destroy_queue().is_empty());
    }

    #[test]
    #[should_panic(expected = "destroyed texture")]
    fn test_drawing_destroyed_texture_panics() {
        let (mut ctx, _log) = ctx();
        let tex = ctx.create_texture(4, 4, TextureConfig::default());
        ctx.destroy_texture(&tex);
        ctx.prepare_texture(ctx.default_batch(), &tex, NOOP_TINT);
    }

    #[test]
    fn test_dropped_texture_destroyed_next_frame() {
        let (mut ctx, log) = ctx();
        let tex = ctx.create_texture(4, 4, TextureConfig::default());
        let handle = tex.handle();
        std::thread::spawn(move || drop(tex)).join().unwrap();
        assert!(!log.commands().contains(&Command::DeleteTexture(handle)));
        ctx.begin_frame(100, 100);
        assert!(log.commands().contains(&Command::DeleteTexture(handle)));
    }

    #[test]
    fn test_upload_from_image() {
        let (mut ctx, log) = ctx();
        let img = RgbaImage::new(3, 2);
        let tex = ctx.create_texture_from_image(&img, TextureConfig::default().linear(false));
        assert_eq!((tex.width(), tex.height()), (3, 2));
        assert!(log.commands().contains(&Command::UpdateTexture {
            handle: tex.handle(),
            width: 3,
            height: 2,
        }));
    }

    #[test]
    fn test_gradient_texture_is_a_strip() {
        let (mut ctx, _log) = ctx();
        let fill = ctx.create_gradient(Gradient::linear(
            0.0,
            0.0,
            1.0,
            0.0,
            &[(0.0, Color::BLACK), (1.0, Color::WHITE)],
        ));
        assert_eq!(fill.texture.width(), GRADIENT_WIDTH);
        assert_eq!(fill.texture.height(), 1);
    }
}
