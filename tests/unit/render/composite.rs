use super::*;

fn repeat_px(px: [u8; 4], n: usize) -> Vec<u8> {
    let mut out = vec![0u8; n.saturating_mul(4)];
    for c in out.chunks_exact_mut(4) {
        c.copy_from_slice(&px);
    }
    out
}

#[test]
fn normal_over_opaque_replaces() {
    let mut dst = repeat_px([10, 20, 30, 255], 4);
    let src = repeat_px([200, 100, 50, 255], 4);
    composite_over_rgba8_premul(&mut dst, &src, 1.0, BlendMode::Normal).unwrap();
    assert_eq!(dst, src);
}

#[test]
fn zero_opacity_is_noop() {
    let mut dst = repeat_px([10, 20, 30, 255], 2);
    let before = dst.clone();
    let src = repeat_px([200, 100, 50, 255], 2);
    for mode in [
        BlendMode::Normal,
        BlendMode::Screen,
        BlendMode::Overlay,
        BlendMode::ColorDodge,
    ] {
        composite_over_rgba8_premul(&mut dst, &src, 0.0, mode).unwrap();
        assert_eq!(dst, before);
    }
}

#[test]
fn screen_brightens_and_multiply_darkens() {
    let base = repeat_px([128, 128, 128, 255], 1);
    let src = repeat_px([128, 128, 128, 255], 1);

    let mut screen = base.clone();
    composite_over_rgba8_premul(&mut screen, &src, 1.0, BlendMode::Screen).unwrap();
    assert!(screen[0] > 128);

    let mut mul = base.clone();
    composite_over_rgba8_premul(&mut mul, &src, 1.0, BlendMode::Multiply).unwrap();
    assert!(mul[0] < 128);
}

#[test]
fn screen_with_black_is_identity() {
    let mut dst = repeat_px([90, 60, 30, 255], 3);
    let before = dst.clone();
    let src = repeat_px([0, 0, 0, 255], 3);
    composite_over_rgba8_premul(&mut dst, &src, 1.0, BlendMode::Screen).unwrap();
    assert_eq!(dst, before);
}

#[test]
fn color_dodge_with_red_boosts_red_channel() {
    let mut dst = repeat_px([100, 100, 100, 255], 1);
    let src = repeat_px([255, 0, 0, 255], 1);
    composite_over_rgba8_premul(&mut dst, &src, 0.5, BlendMode::ColorDodge).unwrap();
    assert!(dst[0] > 100);
    assert_eq!(dst[1], 100);
}

#[test]
fn mismatched_lengths_error() {
    let mut dst = vec![0u8; 8];
    assert!(composite_over_rgba8_premul(&mut dst, &[0u8; 4], 1.0, BlendMode::Normal).is_err());
}

#[test]
fn fill_rect_is_clipped() {
    let mut dst = repeat_px([0, 0, 0, 0], 4 * 4);
    fill_rect_blend(&mut dst, 4, 4, (-2, 2, 2, 10), [255, 0, 0, 255], 1.0, BlendMode::Normal)
        .unwrap();
    let px = |x: usize, y: usize| &dst[(y * 4 + x) * 4..(y * 4 + x) * 4 + 4];
    assert_eq!(px(0, 2), &[255, 0, 0, 255]);
    assert_eq!(px(1, 3), &[255, 0, 0, 255]);
    assert_eq!(px(2, 2), &[0, 0, 0, 0]);
    assert_eq!(px(0, 1), &[0, 0, 0, 0]);
}
