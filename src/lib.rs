//! A retained-mode 2D scene graph with a batching wgpu renderer.
//!
//! Layers live in a [`Scene`] and are addressed by [`LayerId`]. Groups keep their children
//! sorted by depth; painting walks the tree onto a [`Surface`], which bakes transforms into
//! quads queued on a [`GlContext`]. The context batches geometry per shader core and only
//! flushes when the texture, color, batch, target or clip changes. Input from the platform
//! is routed to layers by the dispatchers in [`input`].
//!
//! ```ignore
//! let gpu = GpuContext::new(GpuConfig::default())?;
//! let mut target = unsafe { gpu.create_surface(&window, 800, 600)? };
//! let mut ctx = target.create_context(RendererConfig::default());
//!
//! let mut scene = Scene::new();
//! let image = scene.create(Layer::image(ctx.create_texture_from_image(&img, TextureConfig::default())));
//! scene.add_at(scene.root(), image, 100.0, 50.0);
//!
//! target.render_frame(&mut ctx, |ctx| scene.paint(&mut Surface::new(ctx)))?;
//! ```

pub mod error;
pub mod gl;
pub mod input;
pub mod layer;
mod logging;
pub mod scene;
pub mod surface;
pub mod transform;
pub mod types;

pub use error::GpuError;
pub use gl::{
    GlContext, GpuConfig, GpuContext, Gradient, RendererConfig, SurfaceState, Texture,
    TextureConfig,
};
pub use input::{EventListener, Interaction, LayerEvent, ListenerId};
pub use layer::{Layer, LayerId, LayerState, Origin};
pub use logging::{init_logging, LoggingConfig};
pub use scene::Scene;
pub use surface::Surface;
pub use transform::{Point, Transform2D};
pub use types::{Color, Rect};
