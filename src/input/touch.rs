//! Multi-touch input. Every contact point is its own interaction, keyed by the id the
//! platform assigns it; ids are reused once a contact ends.

use std::collections::HashMap;

use crate::layer::LayerId;
use crate::scene::Scene;
use crate::transform::Point;

use super::{EventListener, InputEvent, Interaction, LayerEvent};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Start,
    Move,
    End,
    Cancel,
}

impl Kind {
    pub fn is_start(self) -> bool {
        self == Kind::Start
    }

    pub fn is_end(self) -> bool {
        matches!(self, Kind::End | Kind::Cancel)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Event {
    pub kind: Kind,
    pub time: f64,
    pub x: f32,
    pub y: f32,
    /// Identifies the contact point across its start, moves and end.
    pub id: i32,
    /// Zero when the device does not report pressure.
    pub pressure: f32,
    /// Contact size; zero when the device does not report it.
    pub size: f32,
}

impl Event {
    pub fn new(kind: Kind, time: f64, x: f32, y: f32, id: i32) -> Self {
        Self {
            kind,
            time,
            x,
            y,
            id,
            pressure: 0.0,
            size: 0.0,
        }
    }

    pub fn with_pressure(mut self, pressure: f32, size: f32) -> Self {
        self.pressure = pressure;
        self.size = size;
        self
    }
}

impl InputEvent for Event {
    fn x(&self) -> f32 {
        self.x
    }

    fn y(&self) -> f32 {
        self.y
    }

    fn time(&self) -> f64 {
        self.time
    }

    fn to_cancel(&self) -> Self {
        Self {
            kind: Kind::Cancel,
            ..*self
        }
    }

    fn wrap(interaction: &mut Interaction<Self>) -> LayerEvent<'_> {
        LayerEvent::Touch(interaction)
    }
}

/// Receives touch events on a layer. Every method defaults to doing nothing.
pub trait Listener {
    fn on_start(&mut self, _scene: &mut Scene, _iact: &mut Interaction<Event>) {}

    fn on_move(&mut self, _scene: &mut Scene, _iact: &mut Interaction<Event>) {}

    fn on_end(&mut self, _scene: &mut Scene, _iact: &mut Interaction<Event>) {}

    fn on_cancel(&mut self, _scene: &mut Scene, _iact: &mut Interaction<Event>) {}
}

/// Adapt a [`Listener`] for [`Scene::connect`]. Non-touch events are ignored.
pub fn listener(mut listener: impl Listener + 'static) -> EventListener {
    Box::new(move |scene: &mut Scene, event: LayerEvent<'_>| {
        let LayerEvent::Touch(iact) = event else {
            return;
        };
        match iact.event().kind {
            Kind::Start => listener.on_start(scene, iact),
            Kind::Move => listener.on_move(scene, iact),
            Kind::End => listener.on_end(scene, iact),
            Kind::Cancel => listener.on_cancel(scene, iact),
        }
    })
}

/// Routes batches of touch events from the platform to layers.
pub struct Dispatcher {
    root: LayerId,
    bubble: bool,
    active: HashMap<i32, Interaction<Event>>,
}

impl Dispatcher {
    pub fn new(root: LayerId, bubble: bool) -> Self {
        Self {
            root,
            bubble,
            active: HashMap::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.active.is_empty()
    }

    /// Number of contact points with an interaction in progress.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn interaction(&self, id: i32) -> Option<&Interaction<Event>> {
        self.active.get(&id)
    }

    /// Dispatch every event in order; each one belongs to the interaction of its id.
    pub fn dispatch(&mut self, scene: &mut Scene, events: &[Event]) {
        for &event in events {
            if !self.active.contains_key(&event.id) && event.kind.is_start() {
                if let Some(hit) = scene.hit_layer(self.root, Point::new(event.x, event.y)) {
                    log::trace!("touch {} started on {hit:?}", event.id);
                    self.active
                        .insert(event.id, Interaction::new(hit, self.bubble, event));
                }
            }
            if let Some(iact) = self.active.get_mut(&event.id) {
                iact.dispatch(scene, event);
            }
            if event.kind.is_end() {
                self.active.remove(&event.id);
            }
        }
    }

    /// Abort the interaction of contact `id`, if any.
    pub fn cancel(&mut self, scene: &mut Scene, id: i32) {
        if let Some(mut iact) = self.active.remove(&id) {
            iact.cancel_now(scene);
        }
    }

    /// Abort every interaction in progress, in id order.
    pub fn cancel_current(&mut self, scene: &mut Scene) {
        let mut ids: Vec<i32> = self.active.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            self.cancel(scene, id);
        }
    }
}
