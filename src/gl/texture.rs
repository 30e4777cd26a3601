//! Reference-counted texture handles, texture options, canvases and gradients.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::RgbaImage;

use crate::types::Color;

use super::destroy::{DestroyQueue, PendingDestroy};
use super::{FramebufferHandle, TextureHandle};

/// Sampling options for a texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureConfig {
    pub repeat_x: bool,
    pub repeat_y: bool,
    /// Linear filtering when true, nearest otherwise.
    pub linear: bool,
    pub mipmaps: bool,
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            repeat_x: false,
            repeat_y: false,
            linear: true,
            mipmaps: false,
        }
    }
}

impl TextureConfig {
    pub fn repeat(mut self, x: bool, y: bool) -> Self {
        self.repeat_x = x;
        self.repeat_y = y;
        self
    }

    pub fn linear(mut self, linear: bool) -> Self {
        self.linear = linear;
        self
    }

    pub fn mipmaps(mut self, mipmaps: bool) -> Self {
        self.mipmaps = mipmaps;
        self
    }
}

pub(crate) struct TextureInner {
    width: u32,
    height: u32,
    handle: TextureHandle,
    framebuffer: Option<FramebufferHandle>,
    config: TextureConfig,
    destroyed: AtomicBool,
    queue: Arc<DestroyQueue>,
}

impl Drop for TextureInner {
    fn drop(&mut self) {
        if !self.destroyed.load(Ordering::Acquire) {
            self.queue.push(PendingDestroy {
                texture: self.handle,
                framebuffer: self.framebuffer,
            });
        }
    }
}

/// A GPU texture, optionally paired with a framebuffer for rendering into it.
///
/// Cloning (or [`reference`](Texture::reference)) adds a reference; dropping (or
/// [`release`](Texture::release)) removes one. When the last reference goes away without an
/// explicit [`GlContext::destroy_texture`](super::GlContext::destroy_texture), the GPU
/// objects are queued and deleted at the start of the next frame. Textures may be dropped
/// from any thread.
#[derive(Clone)]
pub struct Texture {
    inner: Arc<TextureInner>,
}

impl Texture {
    pub(crate) fn new(
        handle: TextureHandle,
        framebuffer: Option<FramebufferHandle>,
        width: u32,
        height: u32,
        config: TextureConfig,
        queue: Arc<DestroyQueue>,
    ) -> Self {
        Self {
            inner: Arc::new(TextureInner {
                width,
                height,
                handle,
                framebuffer,
                config,
                destroyed: AtomicBool::new(false),
                queue,
            }),
        }
    }

    pub fn width(&self) -> u32 {
        self.inner.width
    }

    pub fn height(&self) -> u32 {
        self.inner.height
    }

    pub fn handle(&self) -> TextureHandle {
        self.inner.handle
    }

    /// The paired framebuffer of a render target.
    pub fn framebuffer(&self) -> Option<FramebufferHandle> {
        self.inner.framebuffer
    }

    pub fn config(&self) -> TextureConfig {
        self.inner.config
    }

    /// Take another reference to the same GPU texture.
    pub fn reference(&self) -> Texture {
        self.clone()
    }

    /// Give up this reference.
    pub fn release(self) {}

    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// True once [`GlContext::destroy_texture`](super::GlContext::destroy_texture) ran.
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    /// Mark destroyed; returns false if it already was.
    pub(crate) fn mark_destroyed(&self) -> bool {
        !self.inner.destroyed.swap(true, Ordering::AcqRel)
    }
}

impl PartialEq for Texture {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Texture {}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("handle", &self.inner.handle)
            .field("size", &(self.inner.width, self.inner.height))
            .field("framebuffer", &self.inner.framebuffer)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

/// Something that can be snapshotted into a texture.
pub trait Canvas {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Tightly packed RGBA8 pixels, `width * height * 4` bytes.
    fn rgba(&self) -> &[u8];
}

impl Canvas for RgbaImage {
    fn width(&self) -> u32 {
        self.dimensions().0
    }

    fn height(&self) -> u32 {
        self.dimensions().1
    }

    fn rgba(&self) -> &[u8] {
        self.as_raw()
    }
}

/// Width of the strip texture a gradient is rasterized into.
pub const GRADIENT_WIDTH: u32 = 256;

/// A linear gradient between two points.
#[derive(Clone, Debug, PartialEq)]
pub struct Gradient {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
    /// `(position in [0, 1], color)` pairs sorted by position.
    pub stops: Vec<(f32, Color)>,
}

impl Gradient {
    /// A gradient from `(x0, y0)` to `(x1, y1)`. Stops are clamped to [0, 1] and sorted.
    pub fn linear(x0: f32, y0: f32, x1: f32, y1: f32, stops: &[(f32, Color)]) -> Self {
        let mut stops: Vec<(f32, Color)> = stops
            .iter()
            .map(|&(pos, color)| (pos.clamp(0.0, 1.0), color))
            .collect();
        stops.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self {
            x0,
            y0,
            x1,
            y1,
            stops,
        }
    }

    /// The color at `t` in [0, 1].
    pub fn color_at(&self, t: f32) -> Color {
        let Some(&(first_pos, first)) = self.stops.first() else {
            return Color::TRANSPARENT;
        };
        if t <= first_pos {
            return first;
        }
        for pair in self.stops.windows(2) {
            let (p0, c0) = pair[0];
            let (p1, c1) = pair[1];
            if t <= p1 {
                let f = if p1 > p0 { (t - p0) / (p1 - p0) } else { 1.0 };
                return Color::rgba(
                    c0.r + (c1.r - c0.r) * f,
                    c0.g + (c1.g - c0.g) * f,
                    c0.b + (c1.b - c0.b) * f,
                    c0.a + (c1.a - c0.a) * f,
                );
            }
        }
        self.stops[self.stops.len() - 1].1
    }

    /// Rasterize into a `GRADIENT_WIDTH` x 1 strip.
    pub fn rasterize(&self) -> RgbaImage {
        let mut strip = RgbaImage::new(GRADIENT_WIDTH, 1);
        for x in 0..GRADIENT_WIDTH {
            let t = (x as f32 + 0.5) / GRADIENT_WIDTH as f32;
            let c = self.color_at(t);
            let px = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
            strip.put_pixel(x, 0, image::Rgba([px(c.r), px(c.g), px(c.b), px(c.a)]));
        }
        strip
    }

    /// Texture u coordinate of a point: its projection onto the gradient axis.
    pub fn u_at(&self, x: f32, y: f32) -> f32 {
        let dx = self.x1 - self.x0;
        let dy = self.y1 - self.y0;
        let len2 = dx * dx + dy * dy;
        if len2 == 0.0 {
            return 0.0;
        }
        ((x - self.x0) * dx + (y - self.y0) * dy) / len2
    }
}

/// A gradient ready to fill with: the strip texture plus the geometry to project onto.
#[derive(Clone, Debug)]
pub struct GradientFill {
    pub gradient: Gradient,
    pub texture: Texture,
}
