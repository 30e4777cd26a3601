//! The seam between the batcher and a GPU API.
//!
//! [`GlContext`](super::GlContext) decides *when* geometry reaches the GPU; a [`Backend`]
//! only executes what it is told. Handles are plain integers owned by the backend.

use std::any::Any;
use std::borrow::Cow;

use wgpu::{VertexAttribute, VertexBufferLayout, VertexFormat, VertexStepMode};

use crate::types::Color;

use super::TextureConfig;

/// The built-in program used by every default batch.
pub const DEFAULT_SHADER: &str = include_str!("shader.wgsl");

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FramebufferHandle(pub u32);

impl FramebufferHandle {
    /// The window (or whatever the backend presents to).
    pub const DEFAULT: FramebufferHandle = FramebufferHandle(0);
}

/// Which shader core a draw goes through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CoreKind {
    /// Samples a texture and multiplies it by the tint.
    Texture,
    /// Flat color, already multiplied by the tint.
    Color,
}

impl CoreKind {
    pub(crate) fn index(self) -> usize {
        match self {
            CoreKind::Texture => 0,
            CoreKind::Color => 1,
        }
    }
}

/// WGSL source for a batch program.
///
/// The module must declare the vertex layout of [`QuadVertex`], a uniform block matching
/// [`BatchUniforms`] at group 0 binding 0, and a texture + sampler at group 1 bindings 0
/// and 1 for the texture entry point.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchSource {
    pub wgsl: Cow<'static, str>,
    pub vertex_entry: Cow<'static, str>,
    pub texture_entry: Cow<'static, str>,
    pub color_entry: Cow<'static, str>,
}

impl Default for BatchSource {
    fn default() -> Self {
        Self {
            wgsl: Cow::Borrowed(DEFAULT_SHADER),
            vertex_entry: Cow::Borrowed("vs_main"),
            texture_entry: Cow::Borrowed("fs_texture"),
            color_entry: Cow::Borrowed("fs_color"),
        }
    }
}

impl BatchSource {
    /// A program with custom WGSL and the default entry point names.
    pub fn wgsl(source: impl Into<Cow<'static, str>>) -> Self {
        Self {
            wgsl: source.into(),
            ..Default::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferKind {
    Vertex,
    Index,
}

/// An integer scissor rectangle in target pixels, origin at the top left.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScissorRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl ScissorRect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// The overlap of two rectangles; zero sized when they do not overlap.
    pub fn intersect(&self, other: &ScissorRect) -> ScissorRect {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.width).min(other.x + other.width);
        let y1 = (self.y + self.height).min(other.y + other.height);
        ScissorRect::new(x0, y0, (x1 - x0).max(0), (y1 - y0).max(0))
    }
}

/// Vertex format shared by both shader cores: a position already mapped through the
/// drawing transform, and a texture coordinate.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub tex_coord: [f32; 2],
}

impl QuadVertex {
    pub fn new(x: f32, y: f32, s: f32, t: f32) -> Self {
        Self {
            position: [x, y],
            tex_coord: [s, t],
        }
    }

    pub fn desc() -> VertexBufferLayout<'static> {
        VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as u64,
            step_mode: VertexStepMode::Vertex,
            attributes: &[
                // position
                VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: VertexFormat::Float32x2,
                },
                // tex_coord
                VertexAttribute {
                    offset: 8,
                    shader_location: 1,
                    format: VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// Per-draw uniform block.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BatchUniforms {
    /// Target size in pixels.
    pub viewport: [f32; 2],
    pub _pad: [f32; 2],
    /// Tint for the texture core, tinted fill color for the color core.
    pub color: [f32; 4],
}

/// Everything needed to draw one flushed batch.
#[derive(Debug)]
pub struct DrawCall<'a> {
    pub program: ProgramHandle,
    pub core: CoreKind,
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub vertices: &'a [QuadVertex],
    pub indices: &'a [u16],
    pub texture: Option<TextureHandle>,
    pub uniforms: BatchUniforms,
    pub framebuffer: FramebufferHandle,
    pub scissor: Option<ScissorRect>,
}

/// A GPU API the batcher can drive.
pub trait Backend {
    fn create_program(&mut self, source: &BatchSource) -> ProgramHandle;
    fn delete_program(&mut self, program: ProgramHandle);

    fn create_buffer(&mut self, kind: BufferKind, size_bytes: u64) -> BufferHandle;
    /// Reallocate a buffer. Its previous contents are discarded.
    fn resize_buffer(&mut self, buffer: BufferHandle, size_bytes: u64);
    fn delete_buffer(&mut self, buffer: BufferHandle);

    /// Allocate a texture. `renderable` textures can back a framebuffer.
    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        config: &TextureConfig,
        renderable: bool,
    ) -> TextureHandle;
    /// Replace a texture's pixels with tightly packed RGBA8 data.
    fn update_texture(&mut self, texture: TextureHandle, width: u32, height: u32, rgba: &[u8]);
    fn delete_texture(&mut self, texture: TextureHandle);

    fn create_framebuffer(&mut self, texture: TextureHandle) -> FramebufferHandle;
    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle);

    /// Fill the whole target with `color`.
    fn clear(&mut self, framebuffer: FramebufferHandle, color: Color);

    fn draw(&mut self, call: &DrawCall<'_>);

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scissor_intersection() {
        let a = ScissorRect::new(0, 0, 100, 100);
        let b = ScissorRect::new(50, 60, 100, 100);
        assert_eq!(a.intersect(&b), ScissorRect::new(50, 60, 50, 40));

        let far = ScissorRect::new(200, 200, 10, 10);
        assert!(a.intersect(&far).is_empty());
    }

    #[test]
    fn test_vertex_layout_matches_struct() {
        let layout = QuadVertex::desc();
        assert_eq!(layout.array_stride, 16);
        assert_eq!(layout.attributes.len(), 2);
        assert_eq!(std::mem::size_of::<BatchUniforms>(), 32);
    }
}
