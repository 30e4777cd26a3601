//! The scene graph: layer storage, tree mutation and lifecycle.
//!
//! A [`Scene`] owns every layer in an arena and a permanently attached root group. Groups
//! own the parent pointers of their children (set on add, cleared on remove) but not their
//! lifetime: a removed child stays alive until it is closed.
//!
//! Tree invariants:
//! - every group's children are sorted by depth (see [`GroupLayerCore`](crate::layer::GroupLayerCore));
//! - a layer has at most one parent and the parent graph is acyclic;
//! - a layer is `Added` exactly when it is reachable from the root.

mod hit;
mod paint;

use std::ops::{Index, IndexMut};

use crate::input::{EventListener, EventSignal, LayerEvent, ListenerId};
use crate::layer::{
    arena::Arena, GroupLayer, Layer, LayerId, LayerKind, LayerState,
};
use crate::transform::Transform2D;

pub use paint::clip_bounds;

pub struct Scene {
    layers: Arena<Layer>,
    root: LayerId,
    next_listener: u64,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Create a scene containing only the root group.
    pub fn new() -> Self {
        let mut root = Layer::group().named("root");
        root.state = LayerState::Added;
        let mut layers = Arena::new();
        let root = layers.insert(root);
        Self {
            layers,
            root,
            next_listener: 0,
        }
    }

    /// The root group. It is always in the `Added` state and cannot be closed.
    pub fn root(&self) -> LayerId {
        self.root
    }

    /// Store a detached layer and return its id.
    pub fn create(&mut self, layer: Layer) -> LayerId {
        let id = self.layers.insert(layer);
        log::trace!("created layer {:#x}", id.as_u64());
        id
    }

    /// Number of live layers, including the root.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.layers.contains(id)
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(id)
    }

    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.get_mut(id)
    }

    /// Lifecycle state; ids of closed layers report `Disposed`.
    pub fn state(&self, id: LayerId) -> LayerState {
        self.layers
            .get(id)
            .map_or(LayerState::Disposed, |l| l.state)
    }

    pub fn parent(&self, id: LayerId) -> Option<LayerId> {
        self.layers.get(id).and_then(|l| l.parent)
    }

    fn group(&self, id: LayerId) -> Option<&GroupLayer> {
        self.layers.get(id).and_then(|l| l.as_group())
    }

    fn group_mut(&mut self, id: LayerId) -> Option<&mut GroupLayer> {
        match self.layers.get_mut(id).map(|l| &mut l.kind) {
            Some(LayerKind::Group(group)) => Some(group),
            _ => None,
        }
    }

    /// Children of a group in paint order. Empty for non-groups.
    pub fn children(&self, id: LayerId) -> Vec<LayerId> {
        self.group(id)
            .map(|g| g.children().collect())
            .unwrap_or_default()
    }

    pub fn child_count(&self, id: LayerId) -> usize {
        self.group(id).map_or(0, |g| g.len())
    }

    pub fn child_at(&self, id: LayerId, index: usize) -> Option<LayerId> {
        self.group(id).and_then(|g| g.child_at(index))
    }

    /// True if `ancestor` is `layer` or lies on its parent chain.
    pub fn is_ancestor(&self, ancestor: LayerId, layer: LayerId) -> bool {
        std::iter::successors(Some(layer), |&l| self.parent(l)).any(|l| l == ancestor)
    }

    /// Number of ancestors above `id`; zero for the root and for detached layers.
    pub fn depth_of(&self, id: LayerId) -> usize {
        std::iter::successors(self.parent(id), |&l| self.parent(l)).count()
    }

    /// A layer's transform (identity for closed layers).
    pub fn transform(&mut self, id: LayerId) -> Transform2D {
        self.layers
            .get_mut(id)
            .map_or(Transform2D::IDENTITY, |l| *l.transform())
    }

    fn expect_live(&self, id: LayerId) -> &Layer {
        match self.layers.get(id) {
            Some(layer) => layer,
            None => panic!("layer {id:?} has been disposed"),
        }
    }

    // -------------------------------------------------------------------------
    // Tree mutation
    // -------------------------------------------------------------------------

    /// Add `child` to the group `parent` at the position its depth dictates, returning its
    /// index. Adding a child to its current parent changes nothing.
    ///
    /// The child is first removed from any other parent. If `parent` is attached to the root
    /// the child's subtree becomes `Added`; an interactive child makes `parent` (and its
    /// ancestors) interactive.
    ///
    /// # Panics
    ///
    /// Panics if either layer has been disposed, if `parent` is not a group, or if the add
    /// would make a layer its own ancestor.
    pub fn add(&mut self, parent: LayerId, child: LayerId) -> usize {
        assert!(
            self.expect_live(parent).is_group(),
            "{parent:?} is not a group layer"
        );
        let (current_parent, depth, interactive) = {
            let layer = self.expect_live(child);
            (layer.parent, layer.depth, layer.interactive())
        };

        if current_parent == Some(parent) {
            if let Some(index) = self
                .group(parent)
                .and_then(|g| g.children.find_child(child, depth))
            {
                return index;
            }
        }
        assert!(
            !self.is_ancestor(child, parent),
            "adding {child:?} to {parent:?} would create a cycle"
        );
        if let Some(old) = current_parent {
            self.remove(old, child);
        }

        let index = match self.group_mut(parent) {
            Some(group) => group.children.add(child, depth),
            None => unreachable!("parent checked to be a group"),
        };
        self.layers[child].parent = Some(parent);

        if self.state(parent) == LayerState::Added {
            self.set_state(child, LayerState::Added);
        }
        if interactive {
            self.set_interactive(parent, true);
        }
        index
    }

    /// Set `child`'s translation, then [`add`](Scene::add) it.
    pub fn add_at(&mut self, parent: LayerId, child: LayerId, tx: f32, ty: f32) -> usize {
        if let Some(layer) = self.layers.get_mut(child) {
            layer.set_translation(tx, ty);
        }
        self.add(parent, child)
    }

    /// Remove `child` from `parent`, returning the index it occupied. Returns `None` if
    /// `child` is not a child of `parent`.
    pub fn remove(&mut self, parent: LayerId, child: LayerId) -> Option<usize> {
        let layer = self.layers.get(child)?;
        if layer.parent != Some(parent) {
            return None;
        }
        let depth = layer.depth;
        let index = self.group_mut(parent)?.children.remove(child, depth)?;
        self.detach(child);
        Some(index)
    }

    /// Remove and return the child at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is not a group or `index` is out of bounds.
    pub fn remove_at(&mut self, parent: LayerId, index: usize) -> LayerId {
        let Some(group) = self.group_mut(parent) else {
            panic!("{parent:?} is not a group layer");
        };
        assert!(
            index < group.len(),
            "child index {index} out of bounds ({} children)",
            group.len()
        );
        let child = group.children.remove_at(index).item;
        self.detach(child);
        child
    }

    /// Remove every child of `parent` without closing them.
    pub fn remove_all(&mut self, parent: LayerId) {
        while let Some(last) = self.child_count(parent).checked_sub(1) {
            self.remove_at(parent, last);
        }
    }

    /// Remove and close every child of `parent`. Each child is detached before it is closed.
    pub fn dispose_all(&mut self, parent: LayerId) {
        let children = match self.group_mut(parent) {
            Some(group) => group.children.take_all(),
            None => return,
        };
        for child in &children {
            self.detach(*child);
        }
        for child in children {
            self.close(child);
        }
    }

    fn detach(&mut self, child: LayerId) {
        let Some(layer) = self.layers.get_mut(child) else {
            return;
        };
        layer.parent = None;
        if layer.state == LayerState::Added {
            self.set_state(child, LayerState::Removed);
        }
    }

    /// Dispose a layer: remove it from its parent, close its children (for groups), fire
    /// the `Disposed` state change and free its slot. Closing an already closed layer is a
    /// no-op. The id must not be used afterwards.
    ///
    /// # Panics
    ///
    /// Panics when asked to close the root.
    pub fn close(&mut self, id: LayerId) {
        assert!(id != self.root, "the root layer cannot be closed");
        let Some(layer) = self.layers.get(id) else {
            return;
        };
        if let Some(parent) = layer.parent {
            self.remove(parent, id);
        }
        self.dispose_all(id);
        if let Some(layer) = self.layers.get_mut(id) {
            layer.batch = None;
        }
        self.set_state(id, LayerState::Disposed);
        self.layers.remove(id);
        log::trace!("closed layer {:#x}", id.as_u64());
    }

    /// Change a layer's depth and re-sort it within its parent, returning its new index
    /// (or `None` when it has no parent).
    ///
    /// # Panics
    ///
    /// Panics if the layer has been disposed or if `depth` is NaN.
    pub fn set_depth(&mut self, id: LayerId, depth: f32) -> Option<usize> {
        assert!(!depth.is_nan(), "layer depth must not be NaN");
        let (old, parent) = {
            let layer = self.expect_live(id);
            (layer.depth, layer.parent)
        };
        self.layers[id].depth = depth;
        let parent = parent?;
        self.group_mut(parent)?
            .children
            .depth_changed(id, old, depth)
    }

    /// Mark a layer as (non-)interactive. Making a layer interactive also makes all of its
    /// ancestors interactive.
    pub fn set_interactive(&mut self, id: LayerId, interactive: bool) {
        let Some(layer) = self.layers.get_mut(id) else {
            return;
        };
        if layer.interactive() == interactive {
            return;
        }
        let parent = layer.parent;
        if interactive {
            if let Some(parent) = parent {
                self.set_interactive(parent, true);
            }
        }
        self.layers[id]
            .flags
            .set(crate::layer::LayerFlags::INTERACTIVE, interactive);
    }

    fn set_state(&mut self, id: LayerId, state: LayerState) {
        let Some(layer) = self.layers.get_mut(id) else {
            return;
        };
        if layer.state == state {
            return;
        }
        layer.state = state;

        if !layer.state_listeners.is_empty() {
            let mut listeners = std::mem::take(&mut layer.state_listeners);
            for listener in listeners.iter_mut() {
                listener(id, state);
            }
            let layer = &mut self.layers[id];
            let added = std::mem::replace(&mut layer.state_listeners, listeners);
            layer.state_listeners.extend(added);
        }

        if state != LayerState::Disposed {
            for child in self.children(id) {
                self.set_state(child, state);
            }
        }
    }

    /// Run `f` on every lifecycle transition of `id` (added, removed, disposed).
    ///
    /// # Panics
    ///
    /// Panics if the layer has been disposed.
    pub fn on_state_change(&mut self, id: LayerId, f: impl FnMut(LayerId, LayerState) + 'static) {
        self.expect_live(id);
        self.layers[id].state_listeners.push(Box::new(f));
    }

    // -------------------------------------------------------------------------
    // Event listeners
    // -------------------------------------------------------------------------

    /// Register an event listener on `id`, making the layer and its ancestors interactive.
    ///
    /// # Panics
    ///
    /// Panics if the layer has been disposed.
    pub fn connect(
        &mut self,
        id: LayerId,
        listener: impl FnMut(&mut Scene, LayerEvent<'_>) + 'static,
    ) -> ListenerId {
        self.expect_live(id);
        let listener_id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.layers[id]
            .events
            .get_or_insert_with(EventSignal::default)
            .connect(listener_id, Box::new(listener) as EventListener);
        self.set_interactive(id, true);
        listener_id
    }

    /// Remove a listener. When a non-group layer loses its last listener it stops being
    /// interactive; groups stay interactive until a hit test finds no interactive children.
    pub fn disconnect(&mut self, id: LayerId, listener: ListenerId) -> bool {
        let Some(layer) = self.layers.get_mut(id) else {
            return false;
        };
        let Some(signal) = layer.events.as_mut() else {
            return false;
        };
        if !signal.disconnect(listener) {
            return false;
        }
        if !signal.has_listeners() && !layer.is_group() {
            self.set_interactive(id, false);
        }
        true
    }

    pub fn has_event_listeners(&self, id: LayerId) -> bool {
        self.layers
            .get(id)
            .and_then(|l| l.events.as_ref())
            .is_some_and(|s| s.has_listeners())
    }

    /// Invoke `f` once per listener of `id`.
    ///
    /// Listeners are checked out of the layer for the duration so `f` can hand them the
    /// scene; listeners disconnected mid-emit are skipped.
    pub(crate) fn emit(&mut self, id: LayerId, mut f: impl FnMut(&mut Scene, &mut EventListener)) {
        let mut taken = match self.layers.get_mut(id).and_then(|l| l.events.as_mut()) {
            Some(signal) => signal.check_out(),
            None => return,
        };
        for (listener_id, listener) in taken.iter_mut() {
            let live = self
                .layers
                .get(id)
                .and_then(|l| l.events.as_ref())
                .is_some_and(|s| !s.is_removed(*listener_id));
            if !live {
                continue;
            }
            f(self, listener);
        }
        if let Some(signal) = self.layers.get_mut(id).and_then(|l| l.events.as_mut()) {
            signal.check_in(taken);
        }
    }
}

impl Index<LayerId> for Scene {
    type Output = Layer;

    /// # Panics
    ///
    /// Panics if the layer has been disposed.
    fn index(&self, id: LayerId) -> &Layer {
        self.expect_live(id)
    }
}

impl IndexMut<LayerId> for Scene {
    fn index_mut(&mut self, id: LayerId) -> &mut Layer {
        match self.layers.get_mut(id) {
            Some(layer) => layer,
            None => panic!("layer {id:?} has been disposed"),
        }
    }
}
