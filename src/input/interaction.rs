use crate::layer::LayerId;
use crate::scene::Scene;
use crate::transform::Point;

use super::InputEvent;

/// One gesture (press to release, or a single hover/motion/wheel event) in flight.
///
/// The interaction remembers the layer that was hit when it started; every later event of
/// the gesture is delivered to that layer without hit-testing again. In bubbling mode the
/// event also travels up the parent chain to every ancestor with listeners.
///
/// A listener may [`capture`](Interaction::capture) the interaction, after which only the
/// capturing layer receives events and every other participant gets a cancel event, or
/// [`cancel`](Interaction::cancel) it outright. Both notifications are delivered once the
/// listener that requested them returns; a layer never receives more than one cancel per
/// interaction.
pub struct Interaction<E> {
    hit_layer: LayerId,
    bubble: bool,
    local: Point,
    event: E,
    dispatch_layer: Option<LayerId>,
    capturing_layer: Option<LayerId>,
    canceled: bool,
    /// Cancel broadcast requested by a listener, with the layer to skip.
    pending_cancel: Option<Option<LayerId>>,
    cancel_notified: Vec<LayerId>,
}

impl<E: InputEvent> Interaction<E> {
    pub fn new(hit_layer: LayerId, bubble: bool, event: E) -> Self {
        Self {
            hit_layer,
            bubble,
            local: Point::ZERO,
            event,
            dispatch_layer: None,
            capturing_layer: None,
            canceled: false,
            pending_cancel: None,
            cancel_notified: Vec::new(),
        }
    }

    /// The layer hit when the interaction started.
    pub fn hit_layer(&self) -> LayerId {
        self.hit_layer
    }

    pub fn bubbles(&self) -> bool {
        self.bubble
    }

    /// The event being dispatched (or the last one dispatched).
    pub fn event(&self) -> &E {
        &self.event
    }

    /// Screen x of the current event.
    pub fn x(&self) -> f32 {
        self.event.x()
    }

    /// Screen y of the current event.
    pub fn y(&self) -> f32 {
        self.event.y()
    }

    /// Current event position in the hit layer's coordinate space.
    pub fn local(&self) -> Point {
        self.local
    }

    /// The layer whose listeners are running right now, if any.
    pub fn dispatch_layer(&self) -> Option<LayerId> {
        self.dispatch_layer
    }

    pub fn captured(&self) -> bool {
        self.capturing_layer.is_some()
    }

    pub fn capturing_layer(&self) -> Option<LayerId> {
        self.capturing_layer
    }

    pub fn canceled(&self) -> bool {
        self.canceled
    }

    /// Route the rest of this interaction exclusively to the layer currently being
    /// dispatched to. Every other participant receives a cancel event.
    ///
    /// Capturing again from the capturing layer is a no-op.
    ///
    /// # Panics
    ///
    /// Panics if called outside a dispatch, if the interaction was canceled, or if another
    /// layer already captured it.
    pub fn capture(&mut self) {
        let Some(layer) = self.dispatch_layer else {
            panic!("capture() may only be called while an event is being dispatched");
        };
        assert!(!self.canceled, "cannot capture a canceled interaction");
        match self.capturing_layer {
            Some(current) if current == layer => {}
            Some(current) => panic!("interaction already captured by {current:?}"),
            None => {
                self.capturing_layer = Some(layer);
                self.pending_cancel = Some(Some(layer));
            }
        }
    }

    /// Cancel the interaction: every participant except the capturing layer receives one
    /// cancel event and later events are ignored. Repeated calls are no-ops.
    ///
    /// Inside a listener the broadcast happens once the listener returns. Outside of a
    /// dispatch, use [`Interaction::cancel_now`].
    pub fn cancel(&mut self) {
        if self.canceled {
            return;
        }
        self.canceled = true;
        self.pending_cancel = Some(self.capturing_layer);
    }

    /// Cancel and broadcast immediately, including to the capturing layer.
    pub(crate) fn cancel_now(&mut self, scene: &mut Scene) {
        if self.canceled {
            return;
        }
        self.canceled = true;
        self.notify_cancel(scene, None);
    }

    /// Deliver `event` to the hit layer (and its ancestors when bubbling).
    pub fn dispatch(&mut self, scene: &mut Scene, event: E) {
        if self.canceled {
            return;
        }
        if let Some(local) = scene.screen_to_layer(self.hit_layer, Point::new(event.x(), event.y()))
        {
            self.local = local;
        }
        self.event = event;

        if self.bubble {
            let mut target = Some(self.hit_layer);
            while let Some(layer) = target {
                if self.canceled {
                    break;
                }
                let wanted = self.capturing_layer.map_or(true, |c| c == layer);
                if wanted && scene.has_event_listeners(layer) {
                    self.dispatch_to(scene, layer);
                }
                target = scene.parent(layer);
            }
        } else if scene.has_event_listeners(self.hit_layer) {
            self.dispatch_to(scene, self.hit_layer);
        }
    }

    fn dispatch_to(&mut self, scene: &mut Scene, layer: LayerId) {
        let previous = self.dispatch_layer.replace(layer);
        scene.emit(layer, |scene, listener| listener(scene, E::wrap(self)));
        self.dispatch_layer = previous;

        if let Some(except) = self.pending_cancel.take() {
            self.notify_cancel(scene, except);
        }
    }

    fn notify_cancel(&mut self, scene: &mut Scene, except: Option<LayerId>) {
        let cancel = self.event.to_cancel();
        let saved = std::mem::replace(&mut self.event, cancel);

        let targets: Vec<LayerId> = if self.bubble {
            std::iter::successors(Some(self.hit_layer), |&l| scene.parent(l)).collect()
        } else {
            vec![self.hit_layer]
        };
        for target in targets {
            if Some(target) == except || self.cancel_notified.contains(&target) {
                continue;
            }
            if scene.has_event_listeners(target) {
                self.cancel_notified.push(target);
                self.dispatch_to(scene, target);
            }
        }

        self.event = saved;
    }
}

impl<E: std::fmt::Debug> std::fmt::Debug for Interaction<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interaction")
            .field("hit_layer", &self.hit_layer)
            .field("bubble", &self.bubble)
            .field("event", &self.event)
            .field("capturing_layer", &self.capturing_layer)
            .field("canceled", &self.canceled)
            .finish()
    }
}
