// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CPU rasterization of a [`RenderPlan`].

use kurbo::Point;

use crate::image::RgbaImage;
use crate::plan::{RenderItem, RenderPlan};

/// Composes `plan` over a display-sized image filled with `clear`.
#[must_use]
pub fn compose(plan: &RenderPlan, clear: [u8; 4]) -> RgbaImage {
    let mut image = RgbaImage::new(plan.width, plan.height, clear);
    for item in &plan.items {
        draw_item(&mut image, item);
    }
    image
}

/// Blends one straight-alpha source pixel over `dst` in place.
///
/// Effective coverage is `alpha`, multiplied by the source alpha channel when
/// `use_pixel_alpha` is set. Colour channels mix linearly by coverage; the
/// destination alpha becomes `coverage + dst_alpha · (1 - coverage)`. Results
/// round to nearest.
pub fn blend_pixel(dst: &mut [u8], src: [u8; 4], alpha: f32, use_pixel_alpha: bool) {
    let mut a = f64::from(alpha);
    if use_pixel_alpha {
        a *= f64::from(src[3]) / 255.0;
    }
    let keep = 1.0 - a;
    for (d, s) in dst[..3].iter_mut().zip(src) {
        *d = to_channel(f64::from(s) * a + f64::from(*d) * keep);
    }
    dst[3] = to_channel(255.0 * a + f64::from(dst[3]) * keep);
}

fn draw_item(image: &mut RgbaImage, item: &RenderItem) {
    // Screen pixels the item can touch.
    let bounds = item
        .transform
        .transform_rect_bbox(item.source.to_kurbo())
        .expand();
    let x0 = to_coord(bounds.x0).max(item.clip.left).max(0);
    let y0 = to_coord(bounds.y0).max(item.clip.top).max(0);
    let x1 = to_coord(bounds.x1).min(item.clip.right);
    let y1 = to_coord(bounds.y1).min(item.clip.bottom);

    for y in y0..y1 {
        for x in x0..x1 {
            let centre = Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
            let Some((tx, ty)) = texel(item, item.inverse * centre) else {
                continue;
            };
            let Some(src) = item.buffer.pixel(tx, ty) else {
                continue;
            };
            // x and y are non-negative here: x0 and y0 are clamped to 0.
            let (Ok(px), Ok(py)) = (u32::try_from(x), u32::try_from(y)) else {
                continue;
            };
            if let Some(dst) = image.pixel_mut(px, py) {
                blend_pixel(dst, src, item.alpha, item.use_pixel_alpha);
            }
        }
    }
}

/// Nearest texel under a layer-space point, if it lies inside the source.
fn texel(item: &RenderItem, p: Point) -> Option<(u32, u32)> {
    if !p.is_finite() || p.x < 0.0 || p.y < 0.0 {
        return None;
    }
    // Truncation is floor for non-negative values.
    let (tx, ty) = (to_coord(p.x), to_coord(p.y));
    if !item.source.contains(tx, ty) {
        return None;
    }
    Some((u32::try_from(tx).ok()?, u32::try_from(ty).ok()?))
}

fn to_coord(v: f64) -> i32 {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "value is clamped to the i32 range first"
    )]
    let c = v.clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32;
    c
}

fn to_channel(v: f64) -> u8 {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "value is clamped to 0..=255 before the cast"
    )]
    let c = (v + 0.5).clamp(0.0, 255.0) as u8;
    c
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use super::*;
    use stratum_core::buffer::{GraphicBuffer, PixelFormat};
    use stratum_core::display::DisplayId;
    use stratum_core::geometry::{IntRect, LayerMatrix};
    use stratum_core::layer::{LayerFlags, LayerId};
    use stratum_core::scene::Scene;
    use stratum_core::trace::Tracer;
    use stratum_core::transaction::{Transaction, TransactionId};

    const BG: [u8; 4] = [63, 63, 195, 255];
    const FG: [u8; 4] = [195, 63, 63, 255];

    /// A 256×256 display, a full-screen background, and a 64×64 foreground at
    /// (64, 64).
    struct Fixture {
        scene: Scene,
        fg: LayerId,
    }

    fn solid(w: u32, h: u32, format: PixelFormat, rgba: [u8; 4]) -> Arc<GraphicBuffer> {
        let mut buf = GraphicBuffer::new(w, h, format).unwrap();
        buf.fill(rgba);
        Arc::new(buf)
    }

    fn fixture() -> Fixture {
        let mut scene = Scene::new();
        scene.create_display(256, 256).unwrap();
        let bg = scene.create_layer(256, 256, PixelFormat::Rgba8888).unwrap();
        let fg = scene.create_layer(64, 64, PixelFormat::Rgba8888).unwrap();
        let mut tracer = Tracer::none();
        scene
            .latch_buffer(bg, solid(256, 256, PixelFormat::Rgba8888, BG), &mut tracer)
            .unwrap();
        scene
            .latch_buffer(fg, solid(64, 64, PixelFormat::Rgba8888, FG), &mut tracer)
            .unwrap();
        let mut txn = Transaction::new(TransactionId(0));
        txn.set_layer_z(bg, i32::MAX - 2).unwrap();
        txn.set_layer_z(fg, i32::MAX - 1).unwrap();
        txn.set_position(fg, 64.0, 64.0).unwrap();
        scene.close(txn, &mut tracer).unwrap();
        Fixture { scene, fg }
    }

    impl Fixture {
        fn commit(&mut self, f: impl FnOnce(&mut Transaction, LayerId)) {
            let mut txn = Transaction::new(TransactionId(1));
            f(&mut txn, self.fg);
            self.scene.close(txn, &mut Tracer::none()).unwrap();
        }

        fn render(&self) -> RgbaImage {
            let snap = self.scene.snapshot(DisplayId::MAIN).unwrap();
            compose(&RenderPlan::build(&snap), [0; 4])
        }
    }

    fn rgb(img: &RgbaImage, x: u32, y: u32) -> [u8; 3] {
        let [r, g, b, _] = img.pixel(x, y).unwrap();
        [r, g, b]
    }

    #[test]
    fn blend_rounds_to_nearest() {
        let mut dst = [63, 63, 195, 255];
        blend_pixel(&mut dst, FG, 0.75, true);
        assert_eq!(dst, [162, 63, 96, 255]);
    }

    #[test]
    fn blend_uses_pixel_alpha_unless_opaque() {
        let mut dst = [0, 0, 0, 255];
        blend_pixel(&mut dst, [255, 255, 255, 0], 1.0, true);
        assert_eq!(dst, [0, 0, 0, 255], "fully transparent source is a no-op");
        blend_pixel(&mut dst, [255, 255, 255, 0], 1.0, false);
        assert_eq!(dst, [255, 255, 255, 255], "ignoring pixel alpha draws it");
    }

    #[test]
    fn blend_over_transparent_sets_coverage_alpha() {
        let mut dst = [0, 0, 0, 0];
        blend_pixel(&mut dst, [200, 100, 50, 255], 0.5, true);
        assert_eq!(dst, [100, 50, 25, 128]);
    }

    #[test]
    fn basic_scene() {
        let f = fixture();
        let img = f.render();
        assert_eq!(rgb(&img, 64, 64), [195, 63, 63]);
        assert_eq!(rgb(&img, 127, 127), [195, 63, 63]);
        assert_eq!(rgb(&img, 63, 63), [63, 63, 195]);
        assert_eq!(rgb(&img, 128, 128), [63, 63, 195]);
    }

    #[test]
    fn empty_display_shows_clear_color() {
        let mut scene = Scene::new();
        scene.create_display(4, 4).unwrap();
        let snap = scene.snapshot(DisplayId::MAIN).unwrap();
        let img = compose(&RenderPlan::build(&snap), [9, 8, 7, 6]);
        assert_eq!(img.pixel(3, 3), Some([9, 8, 7, 6]));
    }

    #[test]
    fn crop_keeps_content_in_place() {
        let mut f = fixture();
        f.commit(|t, fg| {
            t.set_crop(fg, Some(IntRect::new(16, 16, 32, 32))).unwrap();
        });
        let img = f.render();
        assert_eq!(rgb(&img, 95, 80), [195, 63, 63]);
        assert_eq!(rgb(&img, 80, 80), [195, 63, 63]);
        assert_eq!(rgb(&img, 96, 96), [63, 63, 195]);
        assert_eq!(rgb(&img, 75, 75), [63, 63, 195]);
    }

    #[test]
    fn final_crop_is_screen_space() {
        let mut f = fixture();
        f.commit(|t, fg| {
            t.set_final_crop(fg, Some(IntRect::new(16, 16, 32, 32)))
                .unwrap();
        });
        let img = f.render();
        assert_eq!(rgb(&img, 64, 64), [63, 63, 195]);
        assert_eq!(rgb(&img, 95, 95), [63, 63, 195]);
    }

    #[test]
    fn final_crop_clips_within_layer() {
        let mut f = fixture();
        f.commit(|t, fg| {
            t.set_final_crop(fg, Some(IntRect::new(80, 80, 96, 96)))
                .unwrap();
        });
        let img = f.render();
        assert_eq!(rgb(&img, 80, 80), [195, 63, 63]);
        assert_eq!(rgb(&img, 95, 95), [195, 63, 63]);
        assert_eq!(rgb(&img, 79, 80), [63, 63, 195]);
        assert_eq!(rgb(&img, 96, 96), [63, 63, 195]);
    }

    #[test]
    fn rotation_matrix() {
        let mut f = fixture();
        let r = core::f64::consts::FRAC_1_SQRT_2;
        f.commit(|t, fg| {
            t.set_matrix(fg, LayerMatrix::new(r, r, -r, r)).unwrap();
        });
        let img = f.render();
        assert_eq!(rgb(&img, 91, 96), [195, 63, 63]);
        assert_eq!(rgb(&img, 96, 91), [63, 63, 195]);
    }

    #[test]
    fn scale_matrix_stretches_content() {
        let mut f = fixture();
        f.commit(|t, fg| {
            t.set_matrix(fg, LayerMatrix::new(2.0, 0.0, 0.0, 2.0)).unwrap();
        });
        let img = f.render();
        assert_eq!(rgb(&img, 190, 190), [195, 63, 63]);
        assert_eq!(rgb(&img, 192, 192), [63, 63, 195]);
    }

    #[test]
    fn alpha_blends_over_background() {
        let mut f = fixture();
        f.commit(|t, fg| {
            t.set_alpha(fg, 0.75).unwrap();
        });
        let img = f.render();
        assert_eq!(rgb(&img, 64, 64), [162, 63, 96]);
        assert_eq!(rgb(&img, 127, 127), [162, 63, 96]);
    }

    #[test]
    fn hide_and_show() {
        let mut f = fixture();
        f.commit(|t, fg| {
            t.hide(fg).unwrap();
        });
        assert_eq!(rgb(&f.render(), 64, 64), [63, 63, 195]);
        f.commit(|t, fg| {
            t.show(fg).unwrap();
        });
        assert_eq!(rgb(&f.render(), 64, 64), [195, 63, 63]);
    }

    #[test]
    fn hidden_flag_and_toggle_combine() {
        let mut f = fixture();
        f.commit(|t, fg| {
            t.set_flags(fg, LayerFlags::HIDDEN.bits(), LayerFlags::HIDDEN.bits())
                .unwrap();
            t.show(fg).unwrap();
        });
        assert_eq!(rgb(&f.render(), 64, 64), [63, 63, 195]);
        f.commit(|t, fg| {
            t.set_flags(fg, 0, LayerFlags::HIDDEN.bits()).unwrap();
        });
        assert_eq!(rgb(&f.render(), 64, 64), [195, 63, 63]);
    }

    #[test]
    fn lower_z_goes_behind() {
        let mut f = fixture();
        f.commit(|t, fg| {
            t.set_layer_z(fg, i32::MAX - 3).unwrap();
        });
        assert_eq!(rgb(&f.render(), 64, 64), [63, 63, 195]);
    }

    #[test]
    fn display_layer_stack_selects_layers() {
        let mut f = fixture();
        f.commit(|t, fg| {
            t.set_layer_stack(fg, 1).unwrap();
        });
        assert_eq!(rgb(&f.render(), 64, 64), [63, 63, 195]);
        f.commit(|t, _| {
            t.set_display_layer_stack(DisplayId::MAIN, 1).unwrap();
        });
        let img = f.render();
        assert_eq!(rgb(&img, 64, 64), [195, 63, 63]);
        assert_eq!(img.pixel(0, 0), Some([0, 0, 0, 0]), "background left stack 1");
    }

    #[test]
    fn rgbx_ignores_pixel_alpha() {
        let mut scene = Scene::new();
        scene.create_display(4, 4).unwrap();
        let id = scene.create_layer(4, 4, PixelFormat::Rgbx8888).unwrap();
        scene
            .latch_buffer(
                id,
                solid(4, 4, PixelFormat::Rgbx8888, [10, 20, 30, 0]),
                &mut Tracer::none(),
            )
            .unwrap();
        let snap = scene.snapshot(DisplayId::MAIN).unwrap();
        let img = compose(&RenderPlan::build(&snap), [0; 4]);
        assert_eq!(img.pixel(1, 1), Some([10, 20, 30, 255]));
    }

    #[test]
    fn stale_size_buffer_is_drawn_within_active_size() {
        let mut f = fixture();
        f.commit(|t, fg| {
            t.set_size(fg, 32, 32).unwrap();
        });
        // A buffer of the wrong size latches but the layer keeps its old
        // 64×64 extent; the larger buffer is clipped to it.
        f.scene
            .latch_buffer(
                f.fg,
                solid(128, 128, PixelFormat::Rgba8888, FG),
                &mut Tracer::none(),
            )
            .unwrap();
        let img = f.render();
        assert_eq!(rgb(&img, 127, 127), [195, 63, 63]);
        assert_eq!(rgb(&img, 128, 128), [63, 63, 195]);
    }

    #[test]
    fn partial_failure_keeps_other_layers() {
        let mut f = fixture();
        f.commit(|t, fg| {
            t.set_matrix(fg, LayerMatrix::new(0.0, 0.0, 0.0, 0.0)).unwrap();
        });
        let snap = f.scene.snapshot(DisplayId::MAIN).unwrap();
        let plan = RenderPlan::build(&snap);
        assert_eq!(plan.skipped.len(), 1);
        let img = compose(&plan, [0; 4]);
        assert_eq!(img.pixel(64, 64), Some(BG));
    }
}
