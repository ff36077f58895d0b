// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render plan: an ordered sequence of draw items for one display.

use alloc::sync::Arc;
use alloc::vec::Vec;

use kurbo::Affine;
use stratum_core::buffer::GraphicBuffer;
use stratum_core::display::DisplayId;
use stratum_core::geometry::IntRect;
use stratum_core::layer::{LayerFlags, LayerId, LayerState};
use stratum_core::scene::SceneSnapshot;

/// Why a layer that should have drawn was left out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Matrix determinant is zero or not finite, so screen pixels cannot be
    /// mapped back into the buffer.
    SingularTransform,
}

/// A layer left out of a plan, with the reason.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SkippedLayer {
    /// The layer.
    pub layer: LayerId,
    /// Why it did not draw.
    pub reason: SkipReason,
}

/// A single draw command in the render plan.
///
/// Items are produced in back-to-front order.
#[derive(Clone, Debug)]
pub struct RenderItem {
    /// The layer this item originates from.
    pub layer_id: LayerId,
    /// The latched buffer to sample.
    pub buffer: Arc<GraphicBuffer>,
    /// Buffer-space texels that may draw: crop ∩ active size ∩ buffer extent.
    pub source: IntRect,
    /// Layer-to-screen mapping.
    pub transform: Affine,
    /// Screen-to-layer mapping.
    pub inverse: Affine,
    /// Screen-space pixels that may be written: final crop ∩ display.
    pub clip: IntRect,
    /// Layer opacity.
    pub alpha: f32,
    /// Whether per-pixel alpha participates in blending.
    pub use_pixel_alpha: bool,
}

/// An ordered list of draw commands for a single display.
#[derive(Clone, Debug, Default)]
pub struct RenderPlan {
    /// Target display for this plan.
    pub display: DisplayId,
    /// Display width in pixels.
    pub width: u32,
    /// Display height in pixels.
    pub height: u32,
    /// Draw items in back-to-front order.
    pub items: Vec<RenderItem>,
    /// Layers that qualified but could not be drawn.
    pub skipped: Vec<SkippedLayer>,
}

impl RenderPlan {
    /// Creates an empty render plan for the given display.
    #[must_use]
    pub fn new(display: DisplayId, width: u32, height: u32) -> Self {
        Self {
            display,
            width,
            height,
            items: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Builds the plan for a snapshot.
    ///
    /// A layer contributes when it is on the display's layer stack, is not
    /// hidden, and has a latched buffer. Contributors are ordered by ascending
    /// z, ties broken by creation order.
    #[must_use]
    pub fn build(snapshot: &SceneSnapshot) -> Self {
        let ds = snapshot.display_state;
        let mut plan = Self::new(snapshot.display, ds.width, ds.height);
        let screen = IntRect::from_size(ds.width, ds.height);

        let mut visible: Vec<&LayerState> = snapshot
            .layers
            .iter()
            .filter(|l| l.layer_stack == ds.layer_stack && !l.is_hidden() && l.buffer.is_some())
            .collect();
        visible.sort_by_key(|l| (l.z, l.creation_seq));

        for layer in visible {
            match Self::item_for(layer, screen) {
                Ok(Some(item)) => plan.items.push(item),
                Ok(None) => {}
                Err(reason) => plan.skipped.push(SkippedLayer {
                    layer: layer.id,
                    reason,
                }),
            }
        }
        plan
    }

    /// Clears the plan for reuse.
    pub fn clear(&mut self) {
        self.items.clear();
        self.skipped.clear();
    }

    /// Resolves one layer. `Ok(None)` means nothing can reach the screen.
    fn item_for(layer: &LayerState, screen: IntRect) -> Result<Option<RenderItem>, SkipReason> {
        let Some(buffer) = layer.buffer.clone() else {
            return Ok(None);
        };
        let (aw, ah) = layer.active_size;
        let mut source = IntRect::from_size(aw, ah)
            .intersect(&IntRect::from_size(buffer.width(), buffer.height()));
        if let Some(crop) = layer.crop {
            source = source.intersect(&crop);
        }
        let clip = layer
            .final_crop
            .map_or(screen, |fc| fc.intersect(&screen));
        if source.is_empty() || clip.is_empty() {
            return Ok(None);
        }

        let det = layer.matrix.determinant();
        if !det.is_finite() || det == 0.0 || !layer.position.is_finite() {
            return Err(SkipReason::SingularTransform);
        }
        let transform = layer.matrix.to_affine(layer.position);
        let use_pixel_alpha =
            !(buffer.format().is_opaque() || layer.flags.contains(LayerFlags::OPAQUE));

        Ok(Some(RenderItem {
            layer_id: layer.id,
            source,
            transform,
            inverse: transform.inverse(),
            clip,
            alpha: layer.alpha,
            use_pixel_alpha,
            buffer,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_core::buffer::PixelFormat;
    use stratum_core::geometry::LayerMatrix;
    use stratum_core::scene::Scene;
    use stratum_core::trace::Tracer;
    use stratum_core::transaction::{Transaction, TransactionId};

    fn scene_with(n: usize) -> (Scene, Vec<LayerId>) {
        let mut scene = Scene::new();
        scene.create_display(64, 64).unwrap();
        let mut ids = Vec::new();
        for _ in 0..n {
            let id = scene.create_layer(8, 8, PixelFormat::Rgba8888).unwrap();
            let buf = GraphicBuffer::new(8, 8, PixelFormat::Rgba8888).unwrap();
            scene
                .latch_buffer(id, Arc::new(buf), &mut Tracer::none())
                .unwrap();
            ids.push(id);
        }
        (scene, ids)
    }

    fn commit(scene: &mut Scene, f: impl FnOnce(&mut Transaction)) {
        let mut txn = Transaction::new(TransactionId(0));
        f(&mut txn);
        scene.close(txn, &mut Tracer::none()).unwrap();
    }

    fn order(scene: &Scene) -> Vec<LayerId> {
        let snap = scene.snapshot(DisplayId::MAIN).unwrap();
        RenderPlan::build(&snap)
            .items
            .iter()
            .map(|i| i.layer_id)
            .collect()
    }

    #[test]
    fn equal_z_keeps_creation_order() {
        let (scene, ids) = scene_with(3);
        assert_eq!(order(&scene), ids);
    }

    #[test]
    fn higher_z_draws_later() {
        let (mut scene, ids) = scene_with(3);
        commit(&mut scene, |t| {
            t.set_layer_z(ids[0], 5).unwrap();
            t.set_layer_z(ids[2], -1).unwrap();
        });
        assert_eq!(order(&scene), [ids[2], ids[1], ids[0]]);
    }

    #[test]
    fn hidden_and_other_stack_are_filtered() {
        let (mut scene, ids) = scene_with(3);
        commit(&mut scene, |t| {
            t.hide(ids[0]).unwrap();
            t.set_layer_stack(ids[1], 1).unwrap();
        });
        assert_eq!(order(&scene), [ids[2]]);
    }

    #[test]
    fn layer_without_buffer_is_filtered() {
        let (mut scene, ids) = scene_with(1);
        scene.create_layer(8, 8, PixelFormat::Rgba8888).unwrap();
        assert_eq!(order(&scene), ids);
    }

    #[test]
    fn singular_matrix_is_skipped_not_fatal() {
        let (mut scene, ids) = scene_with(2);
        commit(&mut scene, |t| {
            t.set_matrix(ids[0], LayerMatrix::new(1.0, 2.0, 0.5, 1.0))
                .unwrap();
        });
        let snap = scene.snapshot(DisplayId::MAIN).unwrap();
        let plan = RenderPlan::build(&snap);
        assert_eq!(plan.items.len(), 1);
        assert_eq!(
            plan.skipped,
            [SkippedLayer {
                layer: ids[0],
                reason: SkipReason::SingularTransform,
            }]
        );
    }

    #[test]
    fn source_is_crop_within_active_size() {
        let (mut scene, ids) = scene_with(1);
        commit(&mut scene, |t| {
            t.set_crop(ids[0], Some(IntRect::new(4, 4, 32, 32))).unwrap();
        });
        let snap = scene.snapshot(DisplayId::MAIN).unwrap();
        let plan = RenderPlan::build(&snap);
        assert_eq!(plan.items[0].source, IntRect::new(4, 4, 8, 8));
    }

    #[test]
    fn disjoint_final_crop_drops_item() {
        let (mut scene, ids) = scene_with(1);
        commit(&mut scene, |t| {
            t.set_final_crop(ids[0], Some(IntRect::new(100, 100, 120, 120)))
                .unwrap();
        });
        let snap = scene.snapshot(DisplayId::MAIN).unwrap();
        let plan = RenderPlan::build(&snap);
        assert!(plan.items.is_empty());
        assert!(plan.skipped.is_empty());
    }
}
