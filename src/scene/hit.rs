//! Hit testing and coordinate conversion between layers and the screen.

use crate::layer::LayerId;
use crate::transform::Point;

use super::Scene;

impl Scene {
    /// Find the layer under `point` (in `id`'s coordinate space), consulting the layer's
    /// custom hit tester if it has one.
    pub fn hit_test(&mut self, id: LayerId, point: Point) -> Option<LayerId> {
        let tester = self.layers.get_mut(id)?.hit_tester.take();
        let Some(mut tester) = tester else {
            return self.hit_test_default(id, point);
        };
        let hit = tester.hit_test(self, id, point);
        if let Some(layer) = self.layers.get_mut(id) {
            if layer.hit_tester.is_none() {
                layer.hit_tester = Some(tester);
            }
        }
        hit
    }

    /// The stock hit test.
    ///
    /// Leaves hit when `point` lies in `[0, width) x [0, height)`. Groups never hit
    /// themselves: they test their interactive, visible children from the top of the paint
    /// order down, converting `point` into each child's space. A child whose transform
    /// cannot be inverted is a miss. A group that finds no interactive children and has no
    /// listeners of its own marks itself non-interactive.
    pub fn hit_test_default(&mut self, id: LayerId, point: Point) -> Option<LayerId> {
        let layer = self.layers.get(id)?;
        if !layer.is_group() {
            return layer.contains_local(point).then_some(id);
        }

        let mut saw_interactive = false;
        for ii in (0..self.child_count(id)).rev() {
            let Some(child) = self.child_at(id, ii) else {
                continue;
            };
            let Some(layer) = self.layers.get(child) else {
                continue;
            };
            if !layer.interactive() {
                continue;
            }
            saw_interactive = true;
            if !layer.visible() {
                continue;
            }
            let Some(local) = self.parent_to_layer(child, point) else {
                continue;
            };
            if let Some(hit) = self.hit_test(child, local) {
                return Some(hit);
            }
        }

        if !saw_interactive && !self.has_event_listeners(id) {
            self.set_interactive(id, false);
        }
        None
    }

    /// Hit-test a screen point against the tree rooted at `root`.
    pub fn hit_layer(&mut self, root: LayerId, screen: Point) -> Option<LayerId> {
        let local = self.parent_to_layer(root, screen)?;
        self.hit_test(root, local)
    }

    /// Map a point from `id`'s parent space into `id`'s space.
    ///
    /// Returns `None` if the layer's transform is not invertible or the layer is gone.
    pub fn parent_to_layer(&mut self, id: LayerId, point: Point) -> Option<Point> {
        let layer = self.layers.get_mut(id)?;
        let origin = layer.origin();
        let local = layer.transform().inverse_transform(point)?;
        Some(local + origin)
    }

    /// Map a point from `id`'s space into its parent's space.
    pub fn layer_to_parent(&mut self, id: LayerId, point: Point) -> Point {
        match self.layers.get_mut(id) {
            Some(layer) => {
                let origin = layer.origin();
                layer.transform().transform(point - origin)
            }
            None => point,
        }
    }

    /// Map a point in `id`'s space all the way up to screen space.
    pub fn layer_to_screen(&mut self, id: LayerId, point: Point) -> Point {
        let mut point = point;
        let mut current = Some(id);
        while let Some(layer) = current {
            point = self.layer_to_parent(layer, point);
            current = self.parent(layer);
        }
        point
    }

    /// Map a screen point into `id`'s space, applying every ancestor's inverse transform
    /// from the top down.
    pub fn screen_to_layer(&mut self, id: LayerId, screen: Point) -> Option<Point> {
        if !self.contains(id) {
            return None;
        }
        let mut chain: Vec<LayerId> = std::iter::successors(Some(id), |&l| self.parent(l)).collect();
        chain.reverse();
        chain
            .into_iter()
            .try_fold(screen, |p, layer| self.parent_to_layer(layer, p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::Layer;
    use crate::surface::Surface;
    use std::cell::Cell;
    use std::f32::consts::FRAC_PI_2;
    use std::rc::Rc;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    fn sized(scene: &mut Scene, w: f32, h: f32) -> LayerId {
        let mut layer = Layer::custom(|_: &mut Surface<'_>, _: f32, _: f32| {});
        layer.set_size(w, h);
        scene.create(layer)
    }

    #[test]
    fn test_hit_translated_leaf_receives_local_point() {
        let mut scene = Scene::new();
        let root = scene.root();
        let leaf = sized(&mut scene, 10.0, 10.0);
        scene.add_at(root, leaf, 50.0, 50.0);
        scene.set_interactive(leaf, true);

        let seen = Rc::new(Cell::new(Point::ZERO));
        let probe = seen.clone();
        scene[leaf].set_hit_tester(move |scene: &mut Scene, layer: LayerId, p: Point| {
            probe.set(p);
            scene.hit_test_default(layer, p)
        });

        assert_eq!(scene.hit_layer(root, Point::new(55.0, 55.0)), Some(leaf));
        assert_eq!(seen.get(), Point::new(5.0, 5.0));
        assert_eq!(scene.hit_layer(root, Point::new(61.0, 55.0)), None);
    }

    #[test]
    fn test_hit_rotated_scaled_nested() {
        let mut scene = Scene::new();
        let root = scene.root();
        let outer = scene.create(Layer::group());
        let inner = scene.create(Layer::group());
        let leaf = sized(&mut scene, 10.0, 20.0);
        scene.add_at(root, outer, 100.0, 0.0);
        scene.add_at(outer, inner, 0.0, 100.0);
        scene.add(inner, leaf);
        scene[inner].set_rotation(FRAC_PI_2);
        scene[leaf].set_scale(2.0, 2.0);
        scene.set_interactive(leaf, true);

        // leaf is 20x40 after scaling, rotated a quarter turn: it covers x in (60, 100]
        // and y in [100, 120) in screen space.
        let screen = Point::new(90.0, 110.0);
        assert_eq!(scene.hit_layer(root, screen), Some(leaf));
        let local = scene.screen_to_layer(leaf, screen).unwrap();
        assert!(approx_eq(local.x, 5.0), "{local:?}");
        assert!(approx_eq(local.y, 5.0), "{local:?}");
        assert_eq!(scene.hit_layer(root, Point::new(110.0, 110.0)), None);
    }

    #[test]
    fn test_topmost_child_wins() {
        let mut scene = Scene::new();
        let root = scene.root();
        let low = sized(&mut scene, 10.0, 10.0);
        let high = sized(&mut scene, 10.0, 10.0);
        scene[high].set_name("high");
        scene.set_depth(high, 1.0);
        scene.add(root, high);
        scene.add(root, low);
        scene.set_interactive(low, true);
        scene.set_interactive(high, true);
        assert_eq!(scene.hit_layer(root, Point::new(5.0, 5.0)), Some(high));

        scene[high].set_visible(false);
        assert_eq!(scene.hit_layer(root, Point::new(5.0, 5.0)), Some(low));
    }

    #[test]
    fn test_non_interactive_layers_are_skipped() {
        let mut scene = Scene::new();
        let root = scene.root();
        let leaf = sized(&mut scene, 10.0, 10.0);
        scene.add(root, leaf);
        assert_eq!(scene.hit_layer(root, Point::new(5.0, 5.0)), None);
    }

    #[test]
    fn test_degenerate_transform_is_a_miss() {
        let mut scene = Scene::new();
        let root = scene.root();
        let leaf = sized(&mut scene, 10.0, 10.0);
        scene.add(root, leaf);
        scene.set_interactive(leaf, true);
        // the determinant underflows to zero
        scene[leaf].set_scale(1e-30, 1e-30);
        assert_eq!(scene.hit_layer(root, Point::new(0.0, 0.0)), None);
        assert_eq!(scene.screen_to_layer(leaf, Point::new(0.0, 0.0)), None);
    }

    #[test]
    fn test_group_deactivates_after_child_removed() {
        let mut scene = Scene::new();
        let root = scene.root();
        let group = scene.create(Layer::group());
        let leaf = sized(&mut scene, 10.0, 10.0);
        scene.add(root, group);
        scene.add(group, leaf);
        scene.connect(leaf, |_, _| {});
        assert!(scene[group].interactive());

        scene.remove(group, leaf);
        assert!(scene[group].interactive());
        assert_eq!(scene.hit_layer(root, Point::new(5.0, 5.0)), None);
        assert!(!scene[group].interactive());
    }

    #[test]
    fn test_group_with_listener_stays_interactive() {
        let mut scene = Scene::new();
        let root = scene.root();
        let group = scene.create(Layer::group());
        scene.add(root, group);
        scene.connect(group, |_, _| {});
        assert_eq!(scene.hit_layer(root, Point::new(5.0, 5.0)), None);
        assert!(scene[group].interactive());
    }

    #[test]
    fn test_origin_shifts_hit_area() {
        let mut scene = Scene::new();
        let root = scene.root();
        let leaf = sized(&mut scene, 10.0, 10.0);
        scene[leaf].set_origin(5.0, 5.0);
        scene.add_at(root, leaf, 20.0, 20.0);
        scene.set_interactive(leaf, true);
        assert_eq!(scene.hit_layer(root, Point::new(16.0, 16.0)), Some(leaf));
        assert_eq!(scene.hit_layer(root, Point::new(26.0, 20.0)), None);
        let screen = scene.layer_to_screen(leaf, Point::new(0.0, 0.0));
        assert_eq!(screen, Point::new(15.0, 15.0));
    }

    #[test]
    fn test_custom_hit_tester_can_claim_group() {
        let mut scene = Scene::new();
        let root = scene.root();
        let group = scene.create(Layer::group());
        scene.add(root, group);
        scene.set_interactive(group, true);
        scene[group].set_hit_tester(|_: &mut Scene, layer: LayerId, p: Point| {
            (p.x < 100.0 && p.y < 100.0).then_some(layer)
        });
        assert_eq!(scene.hit_layer(root, Point::new(50.0, 50.0)), Some(group));
        assert!(scene[group].has_hit_tester());
    }
}
