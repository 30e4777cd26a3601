//! Input dispatch through the layer tree.
//!
//! Raw positioned events from the platform are fed to a per-device dispatcher
//! ([`pointer::Dispatcher`], [`mouse::Dispatcher`], [`touch::Dispatcher`]). The dispatcher
//! hit-tests the scene, starts an [`Interaction`] on the layer that was hit and routes the
//! rest of the gesture to it. Layers receive events through listeners registered with
//! [`Scene::connect`](crate::scene::Scene::connect); every device shares the single
//! [`LayerEvent`] listener signature and a listener matches on the variant it cares about.

pub mod interaction;
pub mod mouse;
pub mod pointer;
pub mod touch;

use crate::scene::Scene;

pub use interaction::Interaction;

/// A listener on a layer's event signal.
///
/// Listeners receive the scene so they can react by mutating it (moving the dragged layer,
/// adding children, ...). Connecting or disconnecting listeners on the layer currently
/// being dispatched to takes effect once the current dispatch completes.
pub type EventListener = Box<dyn FnMut(&mut Scene, LayerEvent<'_>)>;

/// Identifies a connected listener so it can be disconnected later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// An event delivered to a layer, tagged by input device.
pub enum LayerEvent<'a> {
    Pointer(&'a mut Interaction<pointer::Event>),
    Mouse(&'a mut Interaction<mouse::Event>),
    Touch(&'a mut Interaction<touch::Event>),
}

/// A positioned input event that can travel through an [`Interaction`].
pub trait InputEvent: Clone + std::fmt::Debug + 'static {
    /// Screen x coordinate.
    fn x(&self) -> f32;

    /// Screen y coordinate.
    fn y(&self) -> f32;

    /// Timestamp in milliseconds.
    fn time(&self) -> f64;

    /// A cancel event carrying this event's time and position.
    fn to_cancel(&self) -> Self;

    /// Wrap an interaction over this event type into the shared listener payload.
    fn wrap(interaction: &mut Interaction<Self>) -> LayerEvent<'_>;
}

/// Listener storage for one layer.
///
/// During an emit the listeners are checked out of the signal; `emitting` remembers their
/// ids and `removed` collects disconnects requested for them in the meantime.
#[derive(Default)]
pub(crate) struct EventSignal {
    listeners: Vec<(ListenerId, EventListener)>,
    emitting: Vec<ListenerId>,
    removed: Vec<ListenerId>,
}

impl EventSignal {
    pub(crate) fn connect(&mut self, id: ListenerId, listener: EventListener) {
        self.listeners.push((id, listener));
    }

    /// Returns true if `id` was connected.
    pub(crate) fn disconnect(&mut self, id: ListenerId) -> bool {
        if let Some(pos) = self.listeners.iter().position(|(lid, _)| *lid == id) {
            drop(self.listeners.remove(pos));
            return true;
        }
        if self.emitting.contains(&id) && !self.removed.contains(&id) {
            self.removed.push(id);
            return true;
        }
        false
    }

    pub(crate) fn has_listeners(&self) -> bool {
        self.listeners.len() + self.emitting.len() > self.removed.len()
    }

    pub(crate) fn is_removed(&self, id: ListenerId) -> bool {
        self.removed.contains(&id)
    }

    /// Check out every listener for an emit.
    pub(crate) fn check_out(&mut self) -> Vec<(ListenerId, EventListener)> {
        let taken = std::mem::take(&mut self.listeners);
        self.emitting.extend(taken.iter().map(|(id, _)| *id));
        taken
    }

    /// Return listeners checked out by [`EventSignal::check_out`], dropping any that were
    /// disconnected meanwhile. Listeners connected during the emit stay after them.
    pub(crate) fn check_in(&mut self, mut taken: Vec<(ListenerId, EventListener)>) {
        let batch: Vec<ListenerId> = taken.iter().map(|(id, _)| *id).collect();
        taken.retain(|(id, _)| !self.removed.contains(id));
        self.emitting.retain(|id| !batch.contains(id));
        self.removed.retain(|id| !batch.contains(id));
        let added = std::mem::replace(&mut self.listeners, taken);
        self.listeners.extend(added);
    }
}
