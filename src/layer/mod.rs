//! Scene graph nodes.
//!
//! A [`Layer`] holds everything a node owns locally: visibility, alpha/tint, origin,
//! depth, the lazily composed transform and the kind-specific payload. Relationships
//! (parent, children, lifecycle) are managed by [`Scene`](crate::scene::Scene), which stores
//! every layer in an arena and hands out [`LayerId`]s.

pub mod arena;
pub mod group;

use bitflags::bitflags;

use crate::gl::{BatchId, Texture};
use crate::input::EventSignal;
use crate::scene::Scene;
use crate::surface::Surface;
use crate::transform::{Point, Transform2D};
use crate::types::{tint, Rect, NOOP_TINT};

pub use arena::LayerId;
pub use group::{Child, GroupLayerCore};

/// Lifecycle of a layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerState {
    /// Not attached to a rooted tree.
    Removed,
    /// Reachable from the scene root.
    Added,
    /// Closed; the id no longer resolves.
    Disposed,
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct LayerFlags: u8 {
        const VISIBLE = 1 << 0;
        const INTERACTIVE = 1 << 1;
        const XF_DIRTY = 1 << 2;
        const ORIGIN_DIRTY = 1 << 3;
    }
}

/// Where a layer's origin sits relative to its bounds.
///
/// Every variant but `Fixed` is recomputed from the layer's size whenever the size changes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Origin {
    /// Explicit coordinates supplied via [`Layer::set_origin`].
    #[default]
    Fixed,
    Center,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    CenterLeft,
    CenterRight,
    TopCenter,
    BottomCenter,
}

impl Origin {
    fn resolve(self, width: f32, height: f32) -> Option<Point> {
        let (fx, fy) = match self {
            Origin::Fixed => return None,
            Origin::Center => (0.5, 0.5),
            Origin::TopLeft => (0.0, 0.0),
            Origin::TopRight => (1.0, 0.0),
            Origin::BottomLeft => (0.0, 1.0),
            Origin::BottomRight => (1.0, 1.0),
            Origin::CenterLeft => (0.0, 0.5),
            Origin::CenterRight => (1.0, 0.5),
            Origin::TopCenter => (0.5, 0.0),
            Origin::BottomCenter => (0.5, 1.0),
        };
        Some(Point::new(width * fx, height * fy))
    }
}

/// Custom drawing code for clipped and custom layers.
///
/// `width` and `height` are the layer's current size.
pub trait Painter {
    fn paint(&mut self, surface: &mut Surface<'_>, width: f32, height: f32);
}

impl<F> Painter for F
where
    F: FnMut(&mut Surface<'_>, f32, f32),
{
    fn paint(&mut self, surface: &mut Surface<'_>, width: f32, height: f32) {
        self(surface, width, height)
    }
}

/// Replaces a layer's default hit test.
///
/// `point` is in `layer`'s coordinate space. Return `layer`, one of its descendants, or
/// `None`. [`Scene::hit_test_default`] is available to fall back on the stock behaviour.
pub trait HitTester {
    fn hit_test(&mut self, scene: &mut Scene, layer: LayerId, point: Point) -> Option<LayerId>;
}

impl<F> HitTester for F
where
    F: FnMut(&mut Scene, LayerId, Point) -> Option<LayerId>,
{
    fn hit_test(&mut self, scene: &mut Scene, layer: LayerId, point: Point) -> Option<LayerId> {
        self(scene, layer, point)
    }
}

pub type StateListener = Box<dyn FnMut(LayerId, LayerState)>;

/// A container of depth-sorted children, optionally clipped to a fixed size.
#[derive(Debug, Default)]
pub struct GroupLayer {
    pub(crate) children: GroupLayerCore<LayerId>,
    width: f32,
    height: f32,
}

impl GroupLayer {
    /// True when a non-zero clip size has been configured.
    pub fn is_clipped(&self) -> bool {
        self.width != 0.0 && self.height != 0.0
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn child_at(&self, index: usize) -> Option<LayerId> {
        self.children.get(index)
    }

    pub fn children(&self) -> impl DoubleEndedIterator<Item = LayerId> + '_ {
        self.children.iter()
    }
}

/// Draws a texture, or a sub-region of one, scaled to the layer's size.
#[derive(Debug, Default)]
pub struct ImageLayer {
    texture: Option<Texture>,
    size: Option<(f32, f32)>,
    region: Option<Rect>,
}

impl ImageLayer {
    pub fn texture(&self) -> Option<&Texture> {
        self.texture.as_ref()
    }

    /// Source rectangle in texture pixels, or `None` for the whole texture.
    pub fn region(&self) -> Option<Rect> {
        self.region
    }

    fn width(&self) -> f32 {
        match (self.size, self.region, &self.texture) {
            (Some((w, _)), _, _) => w,
            (None, Some(r), _) => r.width,
            (None, None, Some(t)) => t.width() as f32,
            (None, None, None) => 0.0,
        }
    }

    fn height(&self) -> f32 {
        match (self.size, self.region, &self.texture) {
            (Some((_, h)), _, _) => h,
            (None, Some(r), _) => r.height,
            (None, None, Some(t)) => t.height() as f32,
            (None, None, None) => 0.0,
        }
    }
}

/// A fixed-size layer whose painter runs inside a scissor clip of that size.
pub struct ClippedLayer {
    width: f32,
    height: f32,
    pub(crate) painter: Box<dyn Painter>,
}

/// A layer drawn entirely by a user supplied painter.
pub struct CustomLayer {
    width: f32,
    height: f32,
    pub(crate) painter: Box<dyn Painter>,
}

pub enum LayerKind {
    Group(GroupLayer),
    Image(ImageLayer),
    Clipped(ClippedLayer),
    Custom(CustomLayer),
}

impl LayerKind {
    fn name(&self) -> &'static str {
        match self {
            LayerKind::Group(_) => "GroupLayer",
            LayerKind::Image(_) => "ImageLayer",
            LayerKind::Clipped(_) => "ClippedLayer",
            LayerKind::Custom(_) => "CustomLayer",
        }
    }
}

/// A node in the scene graph.
pub struct Layer {
    name: Option<String>,
    pub(crate) flags: LayerFlags,
    pub(crate) state: LayerState,
    pub(crate) parent: Option<LayerId>,
    pub(crate) depth: f32,
    alpha: f32,
    tint: u32,
    origin: Origin,
    origin_point: Point,
    scale_x: f32,
    scale_y: f32,
    rotation: f32,
    transform: Transform2D,
    pub(crate) batch: Option<BatchId>,
    pub(crate) hit_tester: Option<Box<dyn HitTester>>,
    pub(crate) events: Option<EventSignal>,
    pub(crate) state_listeners: Vec<StateListener>,
    pub(crate) kind: LayerKind,
}

impl Layer {
    fn with_kind(kind: LayerKind) -> Self {
        Self {
            name: None,
            flags: LayerFlags::VISIBLE,
            state: LayerState::Removed,
            parent: None,
            depth: 0.0,
            alpha: 1.0,
            tint: NOOP_TINT,
            origin: Origin::Fixed,
            origin_point: Point::ZERO,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
            transform: Transform2D::IDENTITY,
            batch: None,
            hit_tester: None,
            events: None,
            state_listeners: Vec::new(),
            kind,
        }
    }

    /// An unclipped group.
    pub fn group() -> Self {
        Self::with_kind(LayerKind::Group(GroupLayer::default()))
    }

    /// A group clipped to `width` x `height`. A zero dimension disables clipping.
    pub fn clipped_group(width: f32, height: f32) -> Self {
        Self::with_kind(LayerKind::Group(GroupLayer {
            children: GroupLayerCore::new(),
            width,
            height,
        }))
    }

    pub fn image(texture: Texture) -> Self {
        Self::with_kind(LayerKind::Image(ImageLayer {
            texture: Some(texture),
            size: None,
            region: None,
        }))
    }

    pub fn clipped(width: f32, height: f32, painter: impl Painter + 'static) -> Self {
        Self::with_kind(LayerKind::Clipped(ClippedLayer {
            width,
            height,
            painter: Box::new(painter),
        }))
    }

    /// A layer drawn by `painter`. It reports a zero size until [`Layer::set_size`] is called.
    pub fn custom(painter: impl Painter + 'static) -> Self {
        Self::with_kind(LayerKind::Custom(CustomLayer {
            width: 0.0,
            height: 0.0,
            painter: Box::new(painter),
        }))
    }

    /// Builder form of [`Layer::set_name`].
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builder for the initial depth of a detached layer.
    ///
    /// Once a layer is in a group, change its depth through
    /// [`Scene::set_depth`](crate::scene::Scene::set_depth) so the group can re-sort.
    ///
    /// # Panics
    ///
    /// Panics if `depth` is NaN.
    pub fn with_depth(mut self, depth: f32) -> Self {
        assert!(!depth.is_nan(), "layer depth must not be NaN");
        self.depth = depth;
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    pub fn kind(&self) -> &LayerKind {
        &self.kind
    }

    pub fn as_group(&self) -> Option<&GroupLayer> {
        match &self.kind {
            LayerKind::Group(group) => Some(group),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageLayer> {
        match &self.kind {
            LayerKind::Image(image) => Some(image),
            _ => None,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, LayerKind::Group(_))
    }

    pub fn state(&self) -> LayerState {
        self.state
    }

    pub fn parent(&self) -> Option<LayerId> {
        self.parent
    }

    pub fn flags(&self) -> LayerFlags {
        self.flags
    }

    pub fn visible(&self) -> bool {
        self.flags.contains(LayerFlags::VISIBLE)
    }

    /// Invisible layers are skipped by both painting and hit testing, along with their
    /// subtrees.
    pub fn set_visible(&mut self, visible: bool) -> &mut Self {
        self.flags.set(LayerFlags::VISIBLE, visible);
        self
    }

    /// Whether hit testing considers this layer. Toggle through
    /// [`Scene::set_interactive`](crate::scene::Scene::set_interactive), which also
    /// activates the ancestors.
    pub fn interactive(&self) -> bool {
        self.flags.contains(LayerFlags::INTERACTIVE)
    }

    pub fn depth(&self) -> f32 {
        self.depth
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Set alpha (clamped to [0, 1]) and overwrite the alpha byte of the tint.
    ///
    /// Alpha and tint share state: whichever of `set_alpha` and [`Layer::set_tint`] runs last
    /// determines both values.
    pub fn set_alpha(&mut self, alpha: f32) -> &mut Self {
        self.alpha = alpha.clamp(0.0, 1.0);
        self.tint = tint::with_alpha(self.tint, self.alpha);
        self
    }

    pub fn tint(&self) -> u32 {
        self.tint
    }

    /// Set the packed ARGB tint; alpha is re-derived from its high byte.
    pub fn set_tint(&mut self, argb: u32) -> &mut Self {
        self.tint = argb;
        self.alpha = tint::alpha(argb);
        self
    }

    pub fn batch(&self) -> Option<BatchId> {
        self.batch
    }

    /// Draw this layer (and its subtree) with a custom batch instead of the surface's.
    pub fn set_batch(&mut self, batch: Option<BatchId>) -> &mut Self {
        self.batch = batch;
        self
    }

    pub fn set_hit_tester(&mut self, tester: impl HitTester + 'static) -> &mut Self {
        self.hit_tester = Some(Box::new(tester));
        self
    }

    pub fn clear_hit_tester(&mut self) -> &mut Self {
        self.hit_tester = None;
        self
    }

    pub fn has_hit_tester(&self) -> bool {
        self.hit_tester.is_some()
    }

    // -------------------------------------------------------------------------
    // Size and origin
    // -------------------------------------------------------------------------

    /// Local width; zero for unclipped groups and unsized custom layers.
    pub fn width(&self) -> f32 {
        match &self.kind {
            LayerKind::Group(g) => g.width,
            LayerKind::Image(i) => i.width(),
            LayerKind::Clipped(c) => c.width,
            LayerKind::Custom(c) => c.width,
        }
    }

    pub fn height(&self) -> f32 {
        match &self.kind {
            LayerKind::Group(g) => g.height,
            LayerKind::Image(i) => i.height(),
            LayerKind::Clipped(c) => c.height,
            LayerKind::Custom(c) => c.height,
        }
    }

    pub fn scaled_width(&self) -> f32 {
        self.scale_x * self.width()
    }

    pub fn scaled_height(&self) -> f32 {
        self.scale_y * self.height()
    }

    /// Set the layer's size. For groups this is the clip size; for images it overrides the
    /// texture size.
    pub fn set_size(&mut self, width: f32, height: f32) -> &mut Self {
        match &mut self.kind {
            LayerKind::Group(g) => {
                g.width = width;
                g.height = height;
            }
            LayerKind::Image(i) => i.size = Some((width, height)),
            LayerKind::Clipped(c) => {
                c.width = width;
                c.height = height;
            }
            LayerKind::Custom(c) => {
                c.width = width;
                c.height = height;
            }
        }
        self.flags.insert(LayerFlags::ORIGIN_DIRTY);
        self
    }

    /// Replace the texture of an image layer. No-op for other kinds.
    pub fn set_texture(&mut self, texture: Option<Texture>) -> &mut Self {
        if let LayerKind::Image(image) = &mut self.kind {
            image.texture = texture;
            self.flags.insert(LayerFlags::ORIGIN_DIRTY);
        }
        self
    }

    /// Restrict an image layer to a sub-rectangle of its texture (in texture pixels).
    pub fn set_region(&mut self, region: Option<Rect>) -> &mut Self {
        if let LayerKind::Image(image) = &mut self.kind {
            image.region = region;
            self.flags.insert(LayerFlags::ORIGIN_DIRTY);
        }
        self
    }

    /// The origin: the point in local coordinates that the translation positions and around
    /// which rotation and scale apply.
    pub fn origin(&mut self) -> Point {
        if self.flags.contains(LayerFlags::ORIGIN_DIRTY) {
            if let Some(p) = self.origin.resolve(self.width(), self.height()) {
                self.origin_point = p;
            }
            self.flags.remove(LayerFlags::ORIGIN_DIRTY);
        }
        self.origin_point
    }

    pub fn origin_x(&mut self) -> f32 {
        self.origin().x
    }

    pub fn origin_y(&mut self) -> f32 {
        self.origin().y
    }

    pub fn origin_kind(&self) -> Origin {
        self.origin
    }

    /// Set an explicit origin; switches the origin kind to [`Origin::Fixed`].
    pub fn set_origin(&mut self, x: f32, y: f32) -> &mut Self {
        self.origin = Origin::Fixed;
        self.origin_point = Point::new(x, y);
        self.flags.remove(LayerFlags::ORIGIN_DIRTY);
        self
    }

    /// Set a size-relative origin, recomputed whenever the size changes.
    pub fn set_origin_kind(&mut self, origin: Origin) -> &mut Self {
        self.origin = origin;
        self.flags.insert(LayerFlags::ORIGIN_DIRTY);
        self
    }

    // -------------------------------------------------------------------------
    // Transform
    // -------------------------------------------------------------------------

    pub fn tx(&self) -> f32 {
        self.transform.tx
    }

    pub fn ty(&self) -> f32 {
        self.transform.ty
    }

    pub fn set_tx(&mut self, x: f32) -> &mut Self {
        self.transform.tx = x;
        self
    }

    pub fn set_ty(&mut self, y: f32) -> &mut Self {
        self.transform.ty = y;
        self
    }

    pub fn set_translation(&mut self, x: f32, y: f32) -> &mut Self {
        self.transform.set_translation(x, y);
        self
    }

    /// Most recently set x scale (not extracted from the matrix, so its sign survives).
    pub fn scale_x(&self) -> f32 {
        self.scale_x
    }

    pub fn scale_y(&self) -> f32 {
        self.scale_y
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn set_scale_uniform(&mut self, scale: f32) -> &mut Self {
        self.set_scale(scale, scale)
    }

    /// Set the scale. The matrix is recomposed lazily on the next [`Layer::transform`].
    ///
    /// # Panics
    ///
    /// Panics if `sx` or `sy` is zero.
    pub fn set_scale(&mut self, sx: f32, sy: f32) -> &mut Self {
        assert!(
            sx != 0.0 && sy != 0.0,
            "scale must be non-zero on both axes (got {sx}, {sy})"
        );
        if sx != self.scale_x || sy != self.scale_y {
            self.scale_x = sx;
            self.scale_y = sy;
            self.flags.insert(LayerFlags::XF_DIRTY);
        }
        self
    }

    /// # Panics
    ///
    /// Panics if `sx` is zero.
    pub fn set_scale_x(&mut self, sx: f32) -> &mut Self {
        let sy = self.scale_y;
        self.set_scale(sx, sy)
    }

    /// # Panics
    ///
    /// Panics if `sy` is zero.
    pub fn set_scale_y(&mut self, sy: f32) -> &mut Self {
        let sx = self.scale_x;
        self.set_scale(sx, sy)
    }

    /// Set the rotation in radians, around the origin.
    pub fn set_rotation(&mut self, angle: f32) -> &mut Self {
        if angle != self.rotation {
            self.rotation = angle;
            self.flags.insert(LayerFlags::XF_DIRTY);
        }
        self
    }

    /// The layer's transform, recomposed from scale and rotation if either changed since
    /// the last read. The translation is kept as is.
    pub fn transform(&mut self) -> &Transform2D {
        if self.flags.contains(LayerFlags::XF_DIRTY) {
            self.transform
                .set_linear(self.scale_x, self.scale_y, self.rotation);
            self.flags.remove(LayerFlags::XF_DIRTY);
        }
        &self.transform
    }

    /// Default hit test for leaf layers: inside `[0, width) x [0, height)`.
    pub(crate) fn contains_local(&self, p: Point) -> bool {
        p.x >= 0.0 && p.y >= 0.0 && p.x < self.width() && p.y < self.height()
    }
}

impl std::fmt::Debug for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(self.kind.name())
            .field("name", &self.name)
            .field("state", &self.state)
            .field("flags", &self.flags)
            .field("depth", &self.depth)
            .field("alpha", &self.alpha)
            .field("tx", &self.transform.tx)
            .field("ty", &self.transform.ty)
            .finish()
    }
}
