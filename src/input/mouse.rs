//! Mouse input: buttons, motion, wheel and hover.
//!
//! A button press starts an interaction that lasts until every button pressed during it has
//! been released; motion in between arrives as [`Kind::Drag`] at the layer the press hit.
//! Motion with no button down and wheel events outside an interaction are delivered as
//! one-shot interactions to whatever layer is under the pointer. The dispatcher also tracks
//! the hovered layer and sends [`Kind::Hover`] when the pointer enters or leaves it.

use crate::layer::LayerId;
use crate::scene::Scene;
use crate::transform::Point;

use super::{EventListener, InputEvent, Interaction, LayerEvent};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ButtonId {
    Left,
    Right,
    Middle,
    X1,
    X2,
}

impl ButtonId {
    fn bit(self) -> u8 {
        1 << self as u8
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Kind {
    Button { button: ButtonId, down: bool },
    /// Movement with no interaction in progress.
    Motion { dx: f32, dy: f32 },
    /// Movement during a button interaction.
    Drag { dx: f32, dy: f32 },
    Wheel { velocity: f32 },
    /// The pointer entered (`inside`) or left a layer.
    Hover { inside: bool },
    Cancel,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Event {
    pub kind: Kind,
    pub time: f64,
    pub x: f32,
    pub y: f32,
}

impl Event {
    pub fn new(kind: Kind, time: f64, x: f32, y: f32) -> Self {
        Self { kind, time, x, y }
    }

    pub fn button(time: f64, x: f32, y: f32, button: ButtonId, down: bool) -> Self {
        Self::new(Kind::Button { button, down }, time, x, y)
    }

    pub fn motion(time: f64, x: f32, y: f32, dx: f32, dy: f32) -> Self {
        Self::new(Kind::Motion { dx, dy }, time, x, y)
    }

    pub fn wheel(time: f64, x: f32, y: f32, velocity: f32) -> Self {
        Self::new(Kind::Wheel { velocity }, time, x, y)
    }

    fn with_kind(self, kind: Kind) -> Self {
        Self { kind, ..self }
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
        self.with_kind(Kind::Cancel)
    }

    fn wrap(interaction: &mut Interaction<Self>) -> LayerEvent<'_> {
        LayerEvent::Mouse(interaction)
    }
}

/// Receives mouse events on a layer. Every method defaults to doing nothing.
pub trait Listener {
    fn on_button(
        &mut self,
        _scene: &mut Scene,
        _button: ButtonId,
        _down: bool,
        _iact: &mut Interaction<Event>,
    ) {
    }

    fn on_motion(&mut self, _scene: &mut Scene, _dx: f32, _dy: f32, _iact: &mut Interaction<Event>) {}

    fn on_drag(&mut self, _scene: &mut Scene, _dx: f32, _dy: f32, _iact: &mut Interaction<Event>) {}

    fn on_wheel(&mut self, _scene: &mut Scene, _velocity: f32, _iact: &mut Interaction<Event>) {}

    fn on_hover(&mut self, _scene: &mut Scene, _inside: bool, _iact: &mut Interaction<Event>) {}

    fn on_cancel(&mut self, _scene: &mut Scene, _iact: &mut Interaction<Event>) {}
}

/// Adapt a [`Listener`] for [`Scene::connect`]. Non-mouse events are ignored.
pub fn listener(mut listener: impl Listener + 'static) -> EventListener {
    Box::new(move |scene: &mut Scene, event: LayerEvent<'_>| {
        let LayerEvent::Mouse(iact) = event else {
            return;
        };
        match iact.event().kind {
            Kind::Button { button, down } => listener.on_button(scene, button, down, iact),
            Kind::Motion { dx, dy } => listener.on_motion(scene, dx, dy, iact),
            Kind::Drag { dx, dy } => listener.on_drag(scene, dx, dy, iact),
            Kind::Wheel { velocity } => listener.on_wheel(scene, velocity, iact),
            Kind::Hover { inside } => listener.on_hover(scene, inside, iact),
            Kind::Cancel => listener.on_cancel(scene, iact),
        }
    })
}

/// Routes mouse events from the platform to layers.
pub struct Dispatcher {
    root: LayerId,
    bubble: bool,
    current: Option<Interaction<Event>>,
    buttons: u8,
    hovered: Option<LayerId>,
}

impl Dispatcher {
    pub fn new(root: LayerId, bubble: bool) -> Self {
        Self {
            root,
            bubble,
            current: None,
            buttons: 0,
            hovered: None,
        }
    }

    /// True while a button interaction is in progress.
    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&Interaction<Event>> {
        self.current.as_ref()
    }

    /// The layer under the pointer as of the last motion event.
    pub fn hovered(&self) -> Option<LayerId> {
        self.hovered
    }

    pub fn dispatch(&mut self, scene: &mut Scene, event: Event) {
        match event.kind {
            Kind::Button { button, down: true } => {
                if self.current.is_none() {
                    if let Some(hit) = self.hit(scene, &event) {
                        log::trace!("mouse interaction started on {hit:?}");
                        self.current = Some(Interaction::new(hit, self.bubble, event));
                        self.buttons = 0;
                    }
                }
                if let Some(iact) = self.current.as_mut() {
                    self.buttons |= button.bit();
                    iact.dispatch(scene, event);
                }
            }
            Kind::Button { button, down: false } => match self.current.as_mut() {
                // a release whose press we never saw
                None => self.dispatch_solo(scene, event),
                Some(iact) => {
                    self.buttons &= !button.bit();
                    iact.dispatch(scene, event);
                    if self.buttons == 0 {
                        self.current = None;
                    }
                }
            },
            Kind::Motion { dx, dy } => {
                let hit = self.hit(scene, &event);
                self.update_hover(scene, hit, &event);
                match self.current.as_mut() {
                    Some(iact) => iact.dispatch(scene, event.with_kind(Kind::Drag { dx, dy })),
                    None => {
                        if let Some(hit) = hit {
                            Interaction::new(hit, self.bubble, event).dispatch(scene, event);
                        }
                    }
                }
            }
            Kind::Wheel { .. } => match self.current.as_mut() {
                Some(iact) => iact.dispatch(scene, event),
                None => self.dispatch_solo(scene, event),
            },
            Kind::Cancel => self.cancel_current(scene),
            Kind::Drag { .. } | Kind::Hover { .. } => {
                log::warn!("ignoring synthesized mouse event {:?}", event.kind);
            }
        }
    }

    /// Abort the button interaction in progress, sending every participant a cancel event.
    pub fn cancel_current(&mut self, scene: &mut Scene) {
        self.buttons = 0;
        if let Some(mut iact) = self.current.take() {
            iact.cancel_now(scene);
        }
    }

    fn hit(&self, scene: &mut Scene, event: &Event) -> Option<LayerId> {
        scene.hit_layer(self.root, Point::new(event.x, event.y))
    }

    fn dispatch_solo(&self, scene: &mut Scene, event: Event) {
        if let Some(hit) = self.hit(scene, &event) {
            Interaction::new(hit, self.bubble, event).dispatch(scene, event);
        }
    }

    fn update_hover(&mut self, scene: &mut Scene, hit: Option<LayerId>, event: &Event) {
        if hit == self.hovered {
            return;
        }
        if let Some(left) = self.hovered.take().filter(|&l| scene.contains(l)) {
            let exit = event.with_kind(Kind::Hover { inside: false });
            Interaction::new(left, self.bubble, exit).dispatch(scene, exit);
        }
        if let Some(entered) = hit {
            let enter = event.with_kind(Kind::Hover { inside: true });
            Interaction::new(entered, self.bubble, enter).dispatch(scene, enter);
        }
        self.hovered = hit;
    }
}
