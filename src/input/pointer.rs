//! Device-independent pointer input: one press-drag-release gesture at a time, from either
//! a mouse or a touch screen.

use crate::layer::LayerId;
use crate::scene::Scene;
use crate::transform::Point;

use super::{EventListener, InputEvent, Interaction, LayerEvent};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Start,
    Drag,
    End,
    Cancel,
}

impl Kind {
    pub fn is_start(self) -> bool {
        self == Kind::Start
    }

    /// End and cancel both finish a gesture.
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
    /// True if the pointer is a finger rather than a mouse.
    pub is_touch: bool,
}

impl Event {
    pub fn new(kind: Kind, time: f64, x: f32, y: f32, is_touch: bool) -> Self {
        Self {
            kind,
            time,
            x,
            y,
            is_touch,
        }
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
        LayerEvent::Pointer(interaction)
    }
}

/// Receives pointer events on a layer. Every method defaults to doing nothing.
pub trait Listener {
    fn on_start(&mut self, _scene: &mut Scene, _iact: &mut Interaction<Event>) {}

    fn on_drag(&mut self, _scene: &mut Scene, _iact: &mut Interaction<Event>) {}

    fn on_end(&mut self, _scene: &mut Scene, _iact: &mut Interaction<Event>) {}

    fn on_cancel(&mut self, _scene: &mut Scene, _iact: &mut Interaction<Event>) {}
}

/// Adapt a [`Listener`] for [`Scene::connect`]. Non-pointer events are ignored.
pub fn listener(mut listener: impl Listener + 'static) -> EventListener {
    Box::new(move |scene: &mut Scene, event: LayerEvent<'_>| {
        let LayerEvent::Pointer(iact) = event else {
            return;
        };
        match iact.event().kind {
            Kind::Start => listener.on_start(scene, iact),
            Kind::Drag => listener.on_drag(scene, iact),
            Kind::End => listener.on_end(scene, iact),
            Kind::Cancel => listener.on_cancel(scene, iact),
        }
    })
}

/// Routes pointer events from the platform to layers.
///
/// A start event with no gesture in progress hit-tests the tree under `root`; every later
/// event of the gesture goes to the layer that was hit.
pub struct Dispatcher {
    root: LayerId,
    bubble: bool,
    current: Option<Interaction<Event>>,
}

impl Dispatcher {
    /// `bubble` selects whether events also travel up to the hit layer's ancestors.
    pub fn new(root: LayerId, bubble: bool) -> Self {
        Self {
            root,
            bubble,
            current: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&Interaction<Event>> {
        self.current.as_ref()
    }

    pub fn dispatch(&mut self, scene: &mut Scene, event: Event) {
        if self.current.is_none() && event.kind.is_start() {
            if let Some(hit) = scene.hit_layer(self.root, Point::new(event.x, event.y)) {
                log::trace!("pointer interaction started on {hit:?}");
                self.current = Some(Interaction::new(hit, self.bubble, event));
            }
        }
        if let Some(iact) = self.current.as_mut() {
            iact.dispatch(scene, event);
        }
        if event.kind.is_end() {
            self.current = None;
        }
    }

    /// Abort the gesture in progress, sending every participant a cancel event.
    pub fn cancel_current(&mut self, scene: &mut Scene) {
        if let Some(mut iact) = self.current.take() {
            iact.cancel_now(scene);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::Layer;
    use crate::surface::Surface;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<(&'static str, LayerId, Kind)>>>;

    struct Recorder {
        name: &'static str,
        log: Log,
    }

    impl Recorder {
        fn record(&self, iact: &Interaction<Event>) {
            let layer = iact.dispatch_layer().expect("dispatching");
            self.log.borrow_mut().push((self.name, layer, iact.event().kind));
        }
    }

    impl Listener for Recorder {
        fn on_start(&mut self, _scene: &mut Scene, iact: &mut Interaction<Event>) {
            self.record(iact);
        }

        fn on_drag(&mut self, _scene: &mut Scene, iact: &mut Interaction<Event>) {
            self.record(iact);
        }

        fn on_end(&mut self, _scene: &mut Scene, iact: &mut Interaction<Event>) {
            self.record(iact);
        }

        fn on_cancel(&mut self, _scene: &mut Scene, iact: &mut Interaction<Event>) {
            self.record(iact);
        }
    }

    fn sized(scene: &mut Scene, w: f32, h: f32) -> LayerId {
        let mut layer = Layer::custom(|_: &mut Surface<'_>, _: f32, _: f32| {});
        layer.set_size(w, h);
        scene.create(layer)
    }

    /// root > group > leaf, with the leaf 10x10 at (50, 50).
    fn tree() -> (Scene, LayerId, LayerId) {
        let mut scene = Scene::new();
        let root = scene.root();
        let group = scene.create(Layer::group());
        let leaf = sized(&mut scene, 10.0, 10.0);
        scene.add(root, group);
        scene.add_at(group, leaf, 50.0, 50.0);
        (scene, group, leaf)
    }

    fn record(scene: &mut Scene, layer: LayerId, name: &'static str, log: &Log) {
        scene.connect(
            layer,
            listener(Recorder {
                name,
                log: log.clone(),
            }),
        );
    }

    fn ev(kind: Kind, x: f32, y: f32) -> Event {
        Event::new(kind, 0.0, x, y, false)
    }

    #[test]
    fn test_gesture_sticks_to_hit_layer() {
        let (mut scene, _group, leaf) = tree();
        let log = Log::default();
        record(&mut scene, leaf, "leaf", &log);
        let mut dispatcher = Dispatcher::new(scene.root(), false);

        dispatcher.dispatch(&mut scene, ev(Kind::Start, 55.0, 55.0));
        assert_eq!(dispatcher.current().map(|i| i.local()), Some(Point::new(5.0, 5.0)));
        // drags outside the layer still reach it
        dispatcher.dispatch(&mut scene, ev(Kind::Drag, 200.0, 200.0));
        dispatcher.dispatch(&mut scene, ev(Kind::End, 200.0, 200.0));
        assert!(!dispatcher.is_active());

        let kinds: Vec<Kind> = log.borrow().iter().map(|e| e.2).collect();
        assert_eq!(kinds, vec![Kind::Start, Kind::Drag, Kind::End]);
    }

    #[test]
    fn test_miss_starts_nothing() {
        let (mut scene, _group, leaf) = tree();
        let log = Log::default();
        record(&mut scene, leaf, "leaf", &log);
        let mut dispatcher = Dispatcher::new(scene.root(), false);
        dispatcher.dispatch(&mut scene, ev(Kind::Start, 5.0, 5.0));
        assert!(!dispatcher.is_active());
        dispatcher.dispatch(&mut scene, ev(Kind::Drag, 55.0, 55.0));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_bubbles_child_to_root() {
        let (mut scene, group, leaf) = tree();
        let log = Log::default();
        let root = scene.root();
        record(&mut scene, root, "root", &log);
        record(&mut scene, group, "group", &log);
        record(&mut scene, leaf, "leaf", &log);
        let mut dispatcher = Dispatcher::new(root, true);
        dispatcher.dispatch(&mut scene, ev(Kind::Start, 55.0, 55.0));
        let names: Vec<&str> = log.borrow().iter().map(|e| e.0).collect();
        assert_eq!(names, vec!["leaf", "group", "root"]);
    }

    #[test]
    fn test_solo_skips_ancestors() {
        let (mut scene, group, leaf) = tree();
        let log = Log::default();
        record(&mut scene, group, "group", &log);
        record(&mut scene, leaf, "leaf", &log);
        let mut dispatcher = Dispatcher::new(scene.root(), false);
        dispatcher.dispatch(&mut scene, ev(Kind::Start, 55.0, 55.0));
        let names: Vec<&str> = log.borrow().iter().map(|e| e.0).collect();
        assert_eq!(names, vec!["leaf"]);
    }

    #[test]
    fn test_capture_cancels_other_participants() {
        let (mut scene, group, leaf) = tree();
        let log = Log::default();
        record(&mut scene, leaf, "leaf", &log);
        scene.connect(group, |_scene: &mut Scene, event: LayerEvent<'_>| {
            if let LayerEvent::Pointer(iact) = event {
                if iact.event().kind == Kind::Drag {
                    iact.capture();
                }
            }
        });
        record(&mut scene, group, "group", &log);
        let mut dispatcher = Dispatcher::new(scene.root(), true);

        dispatcher.dispatch(&mut scene, ev(Kind::Start, 55.0, 55.0));
        dispatcher.dispatch(&mut scene, ev(Kind::Drag, 56.0, 56.0));
        assert_eq!(dispatcher.current().and_then(|i| i.capturing_layer()), Some(group));
        dispatcher.dispatch(&mut scene, ev(Kind::Drag, 57.0, 57.0));
        dispatcher.dispatch(&mut scene, ev(Kind::End, 57.0, 57.0));

        let events: Vec<(&str, Kind)> = log.borrow().iter().map(|e| (e.0, e.2)).collect();
        assert_eq!(
            events,
            vec![
                ("leaf", Kind::Start),
                ("group", Kind::Start),
                ("leaf", Kind::Drag),
                ("group", Kind::Drag),
                ("leaf", Kind::Cancel),
                ("group", Kind::Drag),
                ("group", Kind::End),
            ]
        );
    }

    #[test]
    fn test_cancel_is_delivered_once() {
        let (mut scene, group, leaf) = tree();
        let log = Log::default();
        scene.connect(leaf, |_scene: &mut Scene, event: LayerEvent<'_>| {
            if let LayerEvent::Pointer(iact) = event {
                if iact.event().kind == Kind::Start {
                    iact.cancel();
                    iact.cancel();
                }
            }
        });
        record(&mut scene, leaf, "leaf", &log);
        record(&mut scene, group, "group", &log);
        let mut dispatcher = Dispatcher::new(scene.root(), true);
        dispatcher.dispatch(&mut scene, ev(Kind::Start, 55.0, 55.0));
        dispatcher.dispatch(&mut scene, ev(Kind::Drag, 56.0, 56.0));
        assert!(dispatcher.current().is_some_and(|i| i.canceled()));
        dispatcher.cancel_current(&mut scene);

        let events: Vec<(&str, Kind)> = log.borrow().iter().map(|e| (e.0, e.2)).collect();
        assert_eq!(
            events,
            vec![
                ("leaf", Kind::Start),
                ("leaf", Kind::Cancel),
                ("group", Kind::Cancel),
            ]
        );
    }

    #[test]
    fn test_cancel_current_notifies_everyone() {
        let (mut scene, group, leaf) = tree();
        let log = Log::default();
        record(&mut scene, leaf, "leaf", &log);
        record(&mut scene, group, "group", &log);
        let mut dispatcher = Dispatcher::new(scene.root(), true);
        dispatcher.dispatch(&mut scene, ev(Kind::Start, 55.0, 55.0));
        log.borrow_mut().clear();

        dispatcher.cancel_current(&mut scene);
        assert!(!dispatcher.is_active());
        let events: Vec<(&str, Kind)> = log.borrow().iter().map(|e| (e.0, e.2)).collect();
        assert_eq!(events, vec![("leaf", Kind::Cancel), ("group", Kind::Cancel)]);
    }

    #[test]
    #[should_panic(expected = "cannot capture a canceled interaction")]
    fn test_capture_after_cancel_panics() {
        let (mut scene, _group, leaf) = tree();
        scene.connect(leaf, |_scene: &mut Scene, event: LayerEvent<'_>| {
            if let LayerEvent::Pointer(iact) = event {
                iact.cancel();
                iact.capture();
            }
        });
        let mut dispatcher = Dispatcher::new(scene.root(), false);
        dispatcher.dispatch(&mut scene, ev(Kind::Start, 55.0, 55.0));
    }

    #[test]
    #[should_panic(expected = "already captured")]
    fn test_double_capture_panics() {
        let (mut scene, group, leaf) = tree();
        // the leaf captures first; the group then tries to capture from its cancel event
        for layer in [leaf, group] {
            scene.connect(layer, |_scene: &mut Scene, event: LayerEvent<'_>| {
                if let LayerEvent::Pointer(iact) = event {
                    iact.capture();
                }
            });
        }
        let mut dispatcher = Dispatcher::new(scene.root(), true);
        dispatcher.dispatch(&mut scene, ev(Kind::Start, 55.0, 55.0));
    }

    #[test]
    #[should_panic(expected = "while an event is being dispatched")]
    fn test_capture_outside_dispatch_panics() {
        let (_scene, _group, leaf) = tree();
        let mut iact = Interaction::new(leaf, false, ev(Kind::Start, 0.0, 0.0));
        iact.capture();
    }

    #[test]
    fn test_listener_can_move_layer_during_drag() {
        let (mut scene, _group, leaf) = tree();
        scene.connect(leaf, |scene: &mut Scene, event: LayerEvent<'_>| {
            if let LayerEvent::Pointer(iact) = event {
                if iact.event().kind == Kind::Drag {
                    let target = iact.hit_layer();
                    scene[target].set_translation(iact.x(), iact.y());
                }
            }
        });
        let mut dispatcher = Dispatcher::new(scene.root(), false);
        dispatcher.dispatch(&mut scene, ev(Kind::Start, 55.0, 55.0));
        dispatcher.dispatch(&mut scene, ev(Kind::Drag, 80.0, 90.0));
        assert_eq!((scene[leaf].tx(), scene[leaf].ty()), (80.0, 90.0));
    }

    #[test]
    fn test_disconnect_during_dispatch_takes_effect_after() {
        let (mut scene, _group, leaf) = tree();
        let calls = Rc::new(RefCell::new(0));
        let id = Rc::new(RefCell::new(None));
        let (c, i) = (calls.clone(), id.clone());
        let listener_id = scene.connect(leaf, move |scene: &mut Scene, event: LayerEvent<'_>| {
            *c.borrow_mut() += 1;
            if let (LayerEvent::Pointer(iact), Some(own)) = (event, *i.borrow()) {
                let layer = iact.hit_layer();
                assert!(scene.disconnect(layer, own));
            }
        });
        *id.borrow_mut() = Some(listener_id);
        let mut dispatcher = Dispatcher::new(scene.root(), false);
        dispatcher.dispatch(&mut scene, ev(Kind::Start, 55.0, 55.0));
        dispatcher.dispatch(&mut scene, ev(Kind::Drag, 55.0, 55.0));
        assert_eq!(*calls.borrow(), 1);
        assert!(!scene.has_event_listeners(leaf));
    }
}
