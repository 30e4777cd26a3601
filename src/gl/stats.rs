use std::fmt;

/// Counters accumulated by a [`GlContext`](super::GlContext) until
/// [`reset_stats`](super::GlContext::reset_stats).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub shader_creates: u64,
    pub framebuffer_creates: u64,
    pub texture_creates: u64,
    pub shader_binds: u64,
    pub framebuffer_binds: u64,
    pub texture_binds: u64,
    pub quads_rendered: u64,
    pub triangles_rendered: u64,
    pub shader_flushes: u64,
}

impl Stats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== GL Stats ===")?;
        writeln!(
            f,
            "Creates: {} shaders, {} framebuffers, {} textures",
            self.shader_creates, self.framebuffer_creates, self.texture_creates
        )?;
        writeln!(
            f,
            "Binds: {} shaders, {} framebuffers, {} textures",
            self.shader_binds, self.framebuffer_binds, self.texture_binds
        )?;
        write!(
            f,
            "Geometry: {} quads, {} triangles in {} flushes",
            self.quads_rendered, self.triangles_rendered, self.shader_flushes
        )
    }
}
