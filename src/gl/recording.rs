//! A headless backend that records what it is asked to do.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::types::Color;

use super::{
    Backend, BatchSource, BufferHandle, BufferKind, CoreKind, DrawCall, FramebufferHandle,
    GlContext, ProgramHandle, QuadVertex, RendererConfig, ScissorRect, TextureConfig,
    TextureHandle,
};

/// A flushed draw, with copies of the geometry it carried.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawRecord {
    pub program: ProgramHandle,
    pub core: CoreKind,
    pub texture: Option<TextureHandle>,
    pub framebuffer: FramebufferHandle,
    pub scissor: Option<ScissorRect>,
    pub viewport: [f32; 2],
    pub color: [f32; 4],
    pub vertices: Vec<QuadVertex>,
    pub indices: Vec<u16>,
}

impl DrawRecord {
    /// Vertices in the order the indices reference them.
    pub fn indexed_positions(&self) -> Vec<[f32; 2]> {
        self.indices
            .iter()
            .map(|&i| self.vertices[i as usize].position)
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    CreateProgram(ProgramHandle),
    DeleteProgram(ProgramHandle),
    CreateBuffer {
        handle: BufferHandle,
        kind: BufferKind,
        size: u64,
    },
    ResizeBuffer {
        handle: BufferHandle,
        size: u64,
    },
    DeleteBuffer(BufferHandle),
    CreateTexture {
        handle: TextureHandle,
        width: u32,
        height: u32,
        renderable: bool,
    },
    UpdateTexture {
        handle: TextureHandle,
        width: u32,
        height: u32,
    },
    DeleteTexture(TextureHandle),
    CreateFramebuffer {
        handle: FramebufferHandle,
        texture: TextureHandle,
    },
    DeleteFramebuffer(FramebufferHandle),
    Clear {
        framebuffer: FramebufferHandle,
        color: Color,
    },
    Draw(DrawRecord),
}

/// Shared view of a [`RecordingBackend`]'s command log.
#[derive(Clone, Debug, Default)]
pub struct CommandLog(Rc<RefCell<Vec<Command>>>);

impl CommandLog {
    fn push(&self, command: Command) {
        self.0.borrow_mut().push(command);
    }

    pub fn commands(&self) -> Vec<Command> {
        self.0.borrow().clone()
    }

    /// Remove and return everything recorded so far.
    pub fn take(&self) -> Vec<Command> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn draws(&self) -> Vec<DrawRecord> {
        self.0
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Command::Draw(d) => Some(d.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

/// A [`Backend`] that never touches a GPU. Every call is appended to a [`CommandLog`];
/// handles are allocated from a counter starting at 1.
#[derive(Debug)]
pub struct RecordingBackend {
    log: CommandLog,
    next_handle: u32,
}

impl RecordingBackend {
    pub fn new() -> (Self, CommandLog) {
        let log = CommandLog::default();
        (
            Self {
                log: log.clone(),
                next_handle: 1,
            },
            log,
        )
    }

    pub fn log(&self) -> &CommandLog {
        &self.log
    }

    fn next(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }
}

impl Backend for RecordingBackend {
    fn create_program(&mut self, _source: &BatchSource) -> ProgramHandle {
        let handle = ProgramHandle(self.next());
        self.log.push(Command::CreateProgram(handle));
        handle
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.log.push(Command::DeleteProgram(program));
    }

    fn create_buffer(&mut self, kind: BufferKind, size_bytes: u64) -> BufferHandle {
        let handle = BufferHandle(self.next());
        self.log.push(Command::CreateBuffer {
            handle,
            kind,
            size: size_bytes,
        });
        handle
    }

    fn resize_buffer(&mut self, buffer: BufferHandle, size_bytes: u64) {
        self.log.push(Command::ResizeBuffer {
            handle: buffer,
            size: size_bytes,
        });
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        self.log.push(Command::DeleteBuffer(buffer));
    }

    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        _config: &TextureConfig,
        renderable: bool,
    ) -> TextureHandle {
        let handle = TextureHandle(self.next());
        self.log.push(Command::CreateTexture {
            handle,
            width,
            height,
            renderable,
        });
        handle
    }

    fn update_texture(&mut self, texture: TextureHandle, width: u32, height: u32, _rgba: &[u8]) {
        self.log.push(Command::UpdateTexture {
            handle: texture,
            width,
            height,
        });
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        self.log.push(Command::DeleteTexture(texture));
    }

    fn create_framebuffer(&mut self, texture: TextureHandle) -> FramebufferHandle {
        let handle = FramebufferHandle(self.next());
        self.log.push(Command::CreateFramebuffer { handle, texture });
        handle
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        self.log.push(Command::DeleteFramebuffer(framebuffer));
    }

    fn clear(&mut self, framebuffer: FramebufferHandle, color: Color) {
        self.log.push(Command::Clear { framebuffer, color });
    }

    fn draw(&mut self, call: &DrawCall<'_>) {
        self.log.push(Command::Draw(DrawRecord {
            program: call.program,
            core: call.core,
            texture: call.texture,
            framebuffer: call.framebuffer,
            scissor: call.scissor,
            viewport: call.uniforms.viewport,
            color: call.uniforms.color,
            vertices: call.vertices.to_vec(),
            indices: call.indices.to_vec(),
        }));
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl GlContext {
    /// A context over a [`RecordingBackend`] with the default configuration.
    pub fn recording() -> (GlContext, CommandLog) {
        Self::recording_with(RendererConfig::default())
    }

    pub fn recording_with(config: RendererConfig) -> (GlContext, CommandLog) {
        let (backend, log) = RecordingBackend::new();
        (GlContext::new(backend, config), log)
    }
}
