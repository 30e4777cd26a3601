//! The drawing façade painters and layers draw through.
//!
//! A [`Surface`] wraps a [`GlContext`] and tracks the current transform, tint, batch and
//! fill. Every drawing call bakes the current transform into the vertices it queues, so
//! nothing about the transform needs to reach the GPU.

use crate::gl::{
    BatchId, FramebufferHandle, GlContext, GradientFill, ScissorRect, Texture,
};
use crate::transform::Transform2D;
use crate::types::{tint, Color, NOOP_TINT};

const QUAD_INDICES: [u16; 6] = [0, 1, 2, 1, 3, 2];

/// What `fill_rect`, `draw_line` and `fill_triangles` paint with.
#[derive(Clone, Debug)]
pub enum Fill {
    /// Flat packed ARGB color.
    Color(u32),
    /// A texture repeated in local coordinates, one texel per unit.
    Pattern(Texture),
    Gradient(GradientFill),
}

#[derive(Clone, Copy, Debug)]
enum Target {
    Default,
    Texture {
        framebuffer: FramebufferHandle,
        width: u32,
        height: u32,
    },
}

pub struct Surface<'a> {
    ctx: &'a mut GlContext,
    target: Target,
    pushed: bool,
    tx: Transform2D,
    saved: Vec<Transform2D>,
    tint: u32,
    batch: BatchId,
    fill: Fill,
}

impl<'a> Surface<'a> {
    /// A surface drawing to the default framebuffer. The base transform scales logical
    /// pixels by the context's scale factor.
    pub fn new(ctx: &'a mut GlContext) -> Self {
        let scale = ctx.scale_factor();
        let mut tx = Transform2D::IDENTITY;
        if scale != 1.0 {
            tx.scale(scale, scale);
        }
        Self::with_target(ctx, Target::Default, tx)
    }

    /// A surface drawing into a render-target texture, in texel coordinates.
    ///
    /// # Panics
    ///
    /// Panics if the texture was not created with
    /// [`GlContext::create_render_target`].
    pub fn for_texture(ctx: &'a mut GlContext, texture: &Texture) -> Self {
        let Some(framebuffer) = texture.framebuffer() else {
            panic!("texture {:?} is not a render target", texture.handle());
        };
        let target = Target::Texture {
            framebuffer,
            width: texture.width(),
            height: texture.height(),
        };
        Self::with_target(ctx, target, Transform2D::IDENTITY)
    }

    fn with_target(ctx: &'a mut GlContext, target: Target, tx: Transform2D) -> Self {
        let batch = ctx.default_batch();
        Self {
            ctx,
            target,
            pushed: false,
            tx,
            saved: Vec::new(),
            tint: NOOP_TINT,
            batch,
            fill: Fill::Color(Color::BLACK.to_argb()),
        }
    }

    /// Bind this surface's target. Texture targets save the context's current target,
    /// which [`end`](Self::end) restores.
    pub fn begin(&mut self) -> &mut Self {
        match self.target {
            Target::Default => self.ctx.bind_default_framebuffer(),
            Target::Texture {
                framebuffer,
                width,
                height,
            } => {
                self.ctx.push_framebuffer(framebuffer, width, height);
                self.pushed = true;
            }
        }
        self
    }

    /// Flush queued drawing and restore whatever [`begin`](Self::begin) replaced.
    pub fn end(&mut self) {
        self.ctx.flush();
        if self.pushed {
            self.ctx.pop_framebuffer();
            self.pushed = false;
        }
    }

    /// The context underneath, for direct texture or batch management.
    pub fn context(&mut self) -> &mut GlContext {
        &mut *self.ctx
    }

    /// Width and height of the target in pixels.
    pub fn target_size(&self) -> (u32, u32) {
        match self.target {
            Target::Default => self.ctx.default_size(),
            Target::Texture { width, height, .. } => (width, height),
        }
    }

    // -------------------------------------------------------------------------
    // Transform
    // -------------------------------------------------------------------------

    pub fn tx(&self) -> &Transform2D {
        &self.tx
    }

    pub fn tx_mut(&mut self) -> &mut Transform2D {
        &mut self.tx
    }

    pub fn set_tx(&mut self, tx: Transform2D) -> &mut Self {
        self.tx = tx;
        self
    }

    /// Push a copy of the current transform.
    pub fn save_tx(&mut self) -> &mut Self {
        self.saved.push(self.tx);
        self
    }

    /// Pop the transform saved by the matching [`save_tx`](Self::save_tx).
    ///
    /// # Panics
    ///
    /// Panics without a matching save.
    pub fn restore_tx(&mut self) -> &mut Self {
        match self.saved.pop() {
            Some(tx) => self.tx = tx,
            None => panic!("Unbalanced save/restore"),
        }
        self
    }

    pub fn translate(&mut self, dx: f32, dy: f32) -> &mut Self {
        self.tx.translate(dx, dy);
        self
    }

    /// # Panics
    ///
    /// Panics if either factor is zero.
    pub fn scale(&mut self, sx: f32, sy: f32) -> &mut Self {
        self.tx.scale(sx, sy);
        self
    }

    pub fn rotate(&mut self, angle: f32) -> &mut Self {
        self.tx.rotate(angle);
        self
    }

    /// Apply `xf` in local space.
    pub fn transform(&mut self, xf: &Transform2D) -> &mut Self {
        self.tx.concatenate(xf);
        self
    }

    /// Apply `xf` in local space, then shift by the negated origin.
    pub fn concatenate(&mut self, xf: &Transform2D, origin_x: f32, origin_y: f32) -> &mut Self {
        self.tx.concatenate(xf);
        self.tx.translate(-origin_x, -origin_y);
        self
    }

    // -------------------------------------------------------------------------
    // Tint and batch
    // -------------------------------------------------------------------------

    pub fn tint(&self) -> u32 {
        self.tint
    }

    pub fn set_tint(&mut self, tint: u32) -> &mut Self {
        self.tint = tint;
        self
    }

    /// Multiply `tint` into the current tint, returning the previous value.
    pub fn combine_tint(&mut self, tint: u32) -> u32 {
        let old = self.tint;
        if tint != NOOP_TINT {
            self.tint = tint::combine(tint, old);
        }
        old
    }

    /// Replace the alpha of the current tint.
    pub fn set_alpha(&mut self, alpha: f32) -> &mut Self {
        self.tint = tint::with_alpha(self.tint, alpha);
        self
    }

    pub fn batch(&self) -> BatchId {
        self.batch
    }

    /// Switch to `batch` if given, returning the batch to restore with
    /// [`pop_batch`](Self::pop_batch).
    pub fn push_batch(&mut self, batch: Option<BatchId>) -> BatchId {
        let old = self.batch;
        if let Some(batch) = batch {
            self.batch = batch;
        }
        old
    }

    pub fn pop_batch(&mut self, batch: BatchId) {
        self.batch = batch;
    }

    // -------------------------------------------------------------------------
    // Fills
    // -------------------------------------------------------------------------

    pub fn fill(&self) -> &Fill {
        &self.fill
    }

    pub fn set_fill_color(&mut self, color: Color) -> &mut Self {
        self.fill = Fill::Color(color.to_argb());
        self
    }

    /// Fill with `texture`, tiled in local coordinates. Use a repeating
    /// [`TextureConfig`](crate::gl::TextureConfig) for seamless tiling.
    pub fn set_fill_pattern(&mut self, texture: Texture) -> &mut Self {
        self.fill = Fill::Pattern(texture);
        self
    }

    pub fn set_fill_gradient(&mut self, gradient: GradientFill) -> &mut Self {
        self.fill = Fill::Gradient(gradient);
        self
    }

    /// Prepare the context for the current fill.
    fn prepare_fill(&mut self) {
        match &self.fill {
            Fill::Color(color) => self.ctx.prepare_color(self.batch, *color, self.tint),
            Fill::Pattern(texture) => self.ctx.prepare_texture(self.batch, texture, self.tint),
            Fill::Gradient(fill) => self.ctx.prepare_texture(self.batch, &fill.texture, self.tint),
        }
    }

    /// Texture coordinates of the local point (`x`, `y`) under the current fill.
    fn fill_uv(&self, x: f32, y: f32) -> (f32, f32) {
        match &self.fill {
            Fill::Color(_) => (0.0, 0.0),
            Fill::Pattern(texture) => (x / texture.width() as f32, y / texture.height() as f32),
            Fill::Gradient(fill) => (fill.gradient.u_at(x, y), 0.5),
        }
    }

    /// Queue the rectangle `[x0, y0, x1, y1]` under `xf` with the current fill.
    fn fill_quad(&mut self, xf: &Transform2D, [x0, y0, x1, y1]: [f32; 4]) {
        self.prepare_fill();
        match &self.fill {
            Fill::Color(_) => self.ctx.add_quad(xf, [x0, y0, x1, y1], [0.0, 0.0, 1.0, 1.0]),
            Fill::Pattern(_) => {
                let (s0, t0) = self.fill_uv(x0, y0);
                let (s1, t1) = self.fill_uv(x1, y1);
                self.ctx.add_quad(xf, [x0, y0, x1, y1], [s0, t0, s1, t1]);
            }
            Fill::Gradient(_) => {
                // the gradient axis can be diagonal, so every corner gets its own coordinate
                let xys = [x0, y0, x1, y0, x0, y1, x1, y1];
                let uvs: Vec<f32> = xys
                    .chunks_exact(2)
                    .flat_map(|p| {
                        let (s, t) = self.fill_uv(p[0], p[1]);
                        [s, t]
                    })
                    .collect();
                self.ctx.add_triangles(xf, &xys, Some(&uvs), &QUAD_INDICES);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Drawing
    // -------------------------------------------------------------------------

    pub fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32) -> &mut Self {
        let xf = self.tx;
        self.fill_quad(&xf, [x, y, x + width, y + height]);
        self
    }

    /// Draw all of `texture` into the rectangle at (`x`, `y`).
    ///
    /// # Panics
    ///
    /// Panics if the texture has been destroyed.
    pub fn draw_image(
        &mut self,
        texture: &Texture,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> &mut Self {
        self.ctx.prepare_texture(self.batch, texture, self.tint);
        self.ctx.add_quad(
            &self.tx,
            [x, y, x + width, y + height],
            [0.0, 0.0, 1.0, 1.0],
        );
        self
    }

    /// Draw the texel region (`sx`, `sy`, `sw`, `sh`) of `texture` into the rectangle
    /// (`dx`, `dy`, `dw`, `dh`).
    ///
    /// # Panics
    ///
    /// Panics if the texture has been destroyed.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_image_region(
        &mut self,
        texture: &Texture,
        dx: f32,
        dy: f32,
        dw: f32,
        dh: f32,
        sx: f32,
        sy: f32,
        sw: f32,
        sh: f32,
    ) -> &mut Self {
        let (tw, th) = (texture.width() as f32, texture.height() as f32);
        self.ctx.prepare_texture(self.batch, texture, self.tint);
        self.ctx.add_quad(
            &self.tx,
            [dx, dy, dx + dw, dy + dh],
            [sx / tw, sy / th, (sx + sw) / tw, (sy + sh) / th],
        );
        self
    }

    /// Draw a line `width` wide as a quad oriented along it, extending `width / 2` to
    /// either side. Zero-length lines draw nothing.
    pub fn draw_line(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, width: f32) -> &mut Self {
        let (x0, y0, x1, y1) = if x1 < x0 {
            (x1, y1, x0, y0)
        } else {
            (x0, y0, x1, y1)
        };
        let (dx, dy) = (x1 - x0, y1 - y0);
        let length = (dx * dx + dy * dy).sqrt();
        if length == 0.0 {
            return self;
        }
        let wx = dx * (width / 2.0) / length;
        let wy = dy * (width / 2.0) / length;

        let local = Transform2D::from_parts(1.0, 1.0, dy.atan2(dx), x0 + wy, y0 - wx);
        let xf = self.tx.then(&local);
        self.fill_quad(&xf, [0.0, 0.0, length, width]);
        self
    }

    /// Fill indexed triangles with the current fill. `xys` holds interleaved local
    /// positions.
    ///
    /// # Panics
    ///
    /// Panics if `xys` has odd length, if an index is out of range, or if there are more
    /// vertices than a batch can hold.
    pub fn fill_triangles(&mut self, xys: &[f32], indices: &[u16]) -> &mut Self {
        self.prepare_fill();
        let uvs: Option<Vec<f32>> = match self.fill {
            Fill::Color(_) => None,
            _ => Some(
                xys.chunks_exact(2)
                    .flat_map(|p| {
                        let (s, t) = self.fill_uv(p[0], p[1]);
                        [s, t]
                    })
                    .collect(),
            ),
        };
        self.ctx
            .add_triangles(&self.tx, xys, uvs.as_deref(), indices);
        self
    }

    // -------------------------------------------------------------------------
    // Clipping
    // -------------------------------------------------------------------------

    /// Restrict drawing to the device-space `rect`, intersected with any enclosing clip.
    /// Returns false if nothing would be visible. Pair with [`end_clipped`](Self::end_clipped)
    /// either way.
    pub fn start_clipped(&mut self, rect: ScissorRect) -> bool {
        self.ctx.start_clipped(rect)
    }

    /// # Panics
    ///
    /// Panics without a matching [`start_clipped`](Self::start_clipped).
    pub fn end_clipped(&mut self) {
        self.ctx.end_clipped();
    }

    /// Fill the whole target with `color`, ignoring clips and transform.
    pub fn clear(&mut self, color: Color) -> &mut Self {
        self.ctx.clear(color);
        self
    }
}

impl std::fmt::Debug for Surface<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("target", &self.target)
            .field("tx", &self.tx)
            .field("saved", &self.saved.len())
            .field("tint", &format_args!("{:#010x}", self.tint))
            .field("batch", &self.batch)
            .finish()
    }
}
