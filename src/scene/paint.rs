//! Painting the layer tree onto a [`Surface`].

use crate::gl::ScissorRect;
use crate::layer::{LayerId, LayerKind};
use crate::surface::Surface;
use crate::transform::{Point, Transform2D};

use super::Scene;

/// The device-space rectangle covered by a `width` x `height` box under `tx`.
///
/// Only the translation and the linear part applied to the size are used, so the result
/// is exact for unrotated transforms. Flipped axes are normalized to a positive extent.
pub fn clip_bounds(tx: &Transform2D, width: f32, height: f32) -> ScissorRect {
    let pos = tx.transform(Point::ZERO);
    let size = Point::new(
        tx.m00 * width + tx.m10 * height,
        tx.m01 * width + tx.m11 * height,
    );
    let x = if size.x < 0.0 { pos.x + size.x } else { pos.x };
    let y = if size.y < 0.0 { pos.y + size.y } else { pos.y };
    ScissorRect::new(
        x.floor() as i32,
        y.floor() as i32,
        size.x.abs().round() as i32,
        size.y.abs().round() as i32,
    )
}

impl Scene {
    /// Paint the whole scene. The surface transform is left unchanged.
    pub fn paint(&mut self, surface: &mut Surface<'_>) {
        let root = self.root;
        surface.save_tx();
        self.paint_layer(root, surface);
        surface.restore_tx();
    }

    /// Paint `id` and its subtree on top of the surface's current transform.
    ///
    /// Invisible layers are skipped entirely. The layer's tint is combined into the surface
    /// tint and its batch (if any) replaces the surface batch for the duration; both are
    /// restored afterwards. The surface transform is left concatenated with the layer's
    /// transform, so callers painting siblings restore it themselves.
    pub fn paint_layer(&mut self, id: LayerId, surface: &mut Surface<'_>) {
        let Some(layer) = self.layers.get_mut(id) else {
            return;
        };
        if !layer.visible() {
            return;
        }
        let tint = layer.tint();
        let batch = layer.batch;
        let origin = layer.origin();
        let xf = *layer.transform();

        let old_tint = surface.combine_tint(tint);
        let old_batch = surface.push_batch(batch);
        surface.concatenate(&xf, origin.x, origin.y);
        self.paint_impl(id, surface);
        surface.pop_batch(old_batch);
        surface.set_tint(old_tint);
    }

    fn paint_impl(&mut self, id: LayerId, surface: &mut Surface<'_>) {
        let Some(layer) = self.layers.get_mut(id) else {
            return;
        };
        let (width, height) = (layer.width(), layer.height());
        match &mut layer.kind {
            LayerKind::Group(group) => {
                if group.is_clipped() {
                    let bounds = clip_bounds(surface.tx(), width, height);
                    if surface.start_clipped(bounds) {
                        self.paint_children(id, surface);
                    }
                    surface.end_clipped();
                } else {
                    self.paint_children(id, surface);
                }
            }
            LayerKind::Image(image) => {
                if let Some(texture) = image.texture() {
                    match image.region() {
                        Some(r) => surface.draw_image_region(
                            texture, 0.0, 0.0, width, height, r.x, r.y, r.width, r.height,
                        ),
                        None => surface.draw_image(texture, 0.0, 0.0, width, height),
                    };
                }
            }
            LayerKind::Clipped(clipped) => {
                if width == 0.0 || height == 0.0 {
                    clipped.painter.paint(surface, width, height);
                } else {
                    let bounds = clip_bounds(surface.tx(), width, height);
                    if surface.start_clipped(bounds) {
                        clipped.painter.paint(surface, width, height);
                    }
                    surface.end_clipped();
                }
            }
            LayerKind::Custom(custom) => custom.painter.paint(surface, width, height),
        }
    }

    fn paint_children(&mut self, id: LayerId, surface: &mut Surface<'_>) {
        let base = *surface.tx();
        let mut index = 0;
        while let Some(child) = self.child_at(id, index) {
            *surface.tx_mut() = base;
            self.paint_layer(child, surface);
            index += 1;
        }
        *surface.tx_mut() = base;
    }
}
