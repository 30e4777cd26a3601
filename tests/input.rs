//! Input dispatch through whole scenes.

use std::cell::RefCell;
use std::f32::consts::FRAC_PI_2;
use std::rc::Rc;

use strata::input::{mouse, pointer, touch};
use strata::{Interaction, Layer, LayerEvent, LayerId, Point, Scene, Surface};

fn block(scene: &mut Scene, parent: LayerId, x: f32, y: f32, size: f32) -> LayerId {
    let mut layer = Layer::custom(|_: &mut Surface<'_>, _: f32, _: f32| {});
    layer.set_size(size, size);
    let id = scene.create(layer);
    scene.add_at(parent, id, x, y);
    id
}

/// Moves its layer so the grabbed point follows the pointer.
struct Dragger {
    layer: LayerId,
    grab: Point,
}

impl pointer::Listener for Dragger {
    fn on_start(&mut self, _scene: &mut Scene, iact: &mut Interaction<pointer::Event>) {
        self.grab = iact.local();
    }

    fn on_drag(&mut self, scene: &mut Scene, iact: &mut Interaction<pointer::Event>) {
        let (x, y) = (iact.x() - self.grab.x, iact.y() - self.grab.y);
        if let Some(layer) = scene.layer_mut(self.layer) {
            layer.set_translation(x, y);
        }
    }
}

#[test]
fn test_dragging_a_layer() {
    let mut scene = Scene::new();
    let root = scene.root();
    let id = block(&mut scene, root, 10.0, 10.0, 20.0);
    scene.connect(
        id,
        pointer::listener(Dragger {
            layer: id,
            grab: Point::ZERO,
        }),
    );

    let mut dispatcher = pointer::Dispatcher::new(root, false);
    let event = |kind, x, y| pointer::Event::new(kind, 0.0, x, y, false);
    dispatcher.dispatch(&mut scene, event(pointer::Kind::Start, 15.0, 15.0));
    dispatcher.dispatch(&mut scene, event(pointer::Kind::Drag, 60.0, 40.0));
    dispatcher.dispatch(&mut scene, event(pointer::Kind::Drag, 105.0, 55.0));
    dispatcher.dispatch(&mut scene, event(pointer::Kind::End, 105.0, 55.0));
    assert!(!dispatcher.is_active());

    let layer = scene.layer(id).expect("layer is live");
    assert_eq!((layer.tx(), layer.ty()), (100.0, 50.0));
    assert_eq!(scene.hit_layer(root, Point::new(110.0, 60.0)), Some(id));
    assert_eq!(scene.hit_layer(root, Point::new(15.0, 15.0)), None);
}

#[test]
fn test_hit_through_rotated_group() {
    let mut scene = Scene::new();
    let root = scene.root();
    let group = scene.create(Layer::group());
    scene.add_at(root, group, 100.0, 100.0);
    if let Some(layer) = scene.layer_mut(group) {
        layer.set_rotation(FRAC_PI_2);
    }
    let child = block(&mut scene, group, 0.0, 0.0, 10.0);

    let seen = Rc::new(RefCell::new(None));
    let sink = seen.clone();
    scene.connect(child, move |_: &mut Scene, event: LayerEvent<'_>| {
        if let LayerEvent::Pointer(iact) = event {
            *sink.borrow_mut() = Some(iact.local());
        }
    });

    let mut dispatcher = pointer::Dispatcher::new(root, false);
    // local (5, 2) lands at (100 - 2, 100 + 5) once rotated a quarter turn
    dispatcher.dispatch(
        &mut scene,
        pointer::Event::new(pointer::Kind::Start, 0.0, 98.0, 105.0, false),
    );
    let local = seen.borrow().expect("child was hit");
    assert!((local.x - 5.0).abs() < 1e-3);
    assert!((local.y - 2.0).abs() < 1e-3);
}

type Trace = Rc<RefCell<Vec<(&'static str, pointer::Kind)>>>;

fn trace(scene: &mut Scene, id: LayerId, name: &'static str, log: &Trace, capture: bool) {
    let log = log.clone();
    scene.connect(id, move |_: &mut Scene, event: LayerEvent<'_>| {
        let LayerEvent::Pointer(iact) = event else {
            return;
        };
        let kind = iact.event().kind;
        log.borrow_mut().push((name, kind));
        if capture && kind == pointer::Kind::Drag {
            iact.capture();
        }
    });
}

#[test]
fn test_parent_captures_drag_from_child() {
    let mut scene = Scene::new();
    let root = scene.root();
    let group = scene.create(Layer::group());
    scene.add(root, group);
    let leaf = block(&mut scene, group, 0.0, 0.0, 10.0);
    let log = Trace::default();
    trace(&mut scene, leaf, "leaf", &log, false);
    trace(&mut scene, group, "group", &log, true);

    let mut dispatcher = pointer::Dispatcher::new(root, true);
    for kind in [
        pointer::Kind::Start,
        pointer::Kind::Drag,
        pointer::Kind::Drag,
        pointer::Kind::End,
    ] {
        dispatcher.dispatch(&mut scene, pointer::Event::new(kind, 0.0, 5.0, 5.0, false));
    }

    use pointer::Kind::*;
    assert_eq!(
        *log.borrow(),
        vec![
            ("leaf", Start),
            ("group", Start),
            ("leaf", Drag),
            ("group", Drag),
            ("leaf", Cancel),
            ("group", Drag),
            ("group", End),
        ]
    );
}

#[test]
fn test_hit_tester_lets_events_fall_through() {
    let mut scene = Scene::new();
    let root = scene.root();
    let below = block(&mut scene, root, 0.0, 0.0, 20.0);
    let above = block(&mut scene, root, 0.0, 0.0, 20.0);
    scene.connect(below, |_: &mut Scene, _: LayerEvent<'_>| {});
    scene.connect(above, |_: &mut Scene, _: LayerEvent<'_>| {});
    assert_eq!(scene.hit_layer(root, Point::new(5.0, 5.0)), Some(above));

    if let Some(layer) = scene.layer_mut(above) {
        layer.set_hit_tester(|_: &mut Scene, _: LayerId, _: Point| -> Option<LayerId> { None });
    }
    assert_eq!(scene.hit_layer(root, Point::new(5.0, 5.0)), Some(below));
}

struct Hover {
    log: Rc<RefCell<Vec<(&'static str, bool)>>>,
    name: &'static str,
}

impl mouse::Listener for Hover {
    fn on_hover(&mut self, _scene: &mut Scene, inside: bool, _iact: &mut Interaction<mouse::Event>) {
        self.log.borrow_mut().push((self.name, inside));
    }
}

#[test]
fn test_mouse_hover_moves_between_layers() {
    let mut scene = Scene::new();
    let root = scene.root();
    let left = block(&mut scene, root, 0.0, 0.0, 10.0);
    let right = block(&mut scene, root, 20.0, 0.0, 10.0);
    let log = Rc::new(RefCell::new(Vec::new()));
    for (id, name) in [(left, "left"), (right, "right")] {
        scene.connect(
            id,
            mouse::listener(Hover {
                log: log.clone(),
                name,
            }),
        );
    }

    let mut dispatcher = mouse::Dispatcher::new(root, false);
    dispatcher.dispatch(&mut scene, mouse::Event::motion(0.0, 5.0, 5.0, 0.0, 0.0));
    dispatcher.dispatch(&mut scene, mouse::Event::motion(1.0, 6.0, 5.0, 1.0, 0.0));
    dispatcher.dispatch(&mut scene, mouse::Event::motion(2.0, 25.0, 5.0, 19.0, 0.0));
    dispatcher.dispatch(&mut scene, mouse::Event::motion(3.0, 15.0, 5.0, -10.0, 0.0));
    assert_eq!(dispatcher.hovered(), None);

    assert_eq!(
        *log.borrow(),
        vec![
            ("left", true),
            ("left", false),
            ("right", true),
            ("right", false),
        ]
    );
}

#[test]
fn test_two_fingers_drag_two_layers() {
    let mut scene = Scene::new();
    let root = scene.root();
    let a = block(&mut scene, root, 0.0, 0.0, 10.0);
    let b = block(&mut scene, root, 50.0, 0.0, 10.0);
    for id in [a, b] {
        scene.connect(id, move |scene: &mut Scene, event: LayerEvent<'_>| {
            let LayerEvent::Touch(iact) = event else {
                return;
            };
            if iact.event().kind == touch::Kind::Move {
                let (x, y) = (iact.x(), iact.y());
                if let Some(layer) = scene.layer_mut(id) {
                    layer.set_translation(x, y);
                }
            }
        });
    }

    let mut dispatcher = touch::Dispatcher::new(root, false);
    dispatcher.dispatch(
        &mut scene,
        &[
            touch::Event::new(touch::Kind::Start, 0.0, 5.0, 5.0, 1),
            touch::Event::new(touch::Kind::Start, 0.0, 55.0, 5.0, 2),
        ],
    );
    dispatcher.dispatch(
        &mut scene,
        &[
            touch::Event::new(touch::Kind::Move, 1.0, 30.0, 40.0, 2),
            touch::Event::new(touch::Kind::Move, 1.0, 100.0, 80.0, 1),
        ],
    );
    assert_eq!(dispatcher.active_count(), 2);

    let pos = |scene: &Scene, id| {
        let layer = scene.layer(id).expect("layer is live");
        (layer.tx(), layer.ty())
    };
    assert_eq!(pos(&scene, a), (100.0, 80.0));
    assert_eq!(pos(&scene, b), (30.0, 40.0));

    dispatcher.cancel_current(&mut scene);
    assert!(!dispatcher.is_active());
}
