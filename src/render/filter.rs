//! CSS-style filter functions evaluated as 5x4 color matrices.
//!
//! Matrices are row-major `[r, g, b, a, offset]` per output channel and apply to
//! straight (unpremultiplied) color in `0..=1`.

use rayon::prelude::*;

use crate::foundation::error::StudioResult;
use crate::render::blur::blur_rgba8_premul;
use crate::settings::visual::FilterPreset;

/// Row-major 5x4 color matrix.
pub type ColorMatrix = [f32; 20];

/// Identity matrix.
pub const IDENTITY: ColorMatrix = [
    1.0, 0.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 0.0, 1.0, 0.0,
];

/// `brightness(amount)`: linear slope on color channels.
pub fn brightness(amount: f32) -> ColorMatrix {
    let b = amount.max(0.0);
    [
        b, 0.0, 0.0, 0.0, 0.0, //
        0.0, b, 0.0, 0.0, 0.0, //
        0.0, 0.0, b, 0.0, 0.0, //
        0.0, 0.0, 0.0, 1.0, 0.0,
    ]
}

/// `contrast(amount)`: slope `amount`, intercept `0.5 - 0.5 * amount`.
pub fn contrast(amount: f32) -> ColorMatrix {
    let c = amount.max(0.0);
    let o = 0.5 - 0.5 * c;
    [
        c, 0.0, 0.0, 0.0, o, //
        0.0, c, 0.0, 0.0, o, //
        0.0, 0.0, c, 0.0, o, //
        0.0, 0.0, 0.0, 1.0, 0.0,
    ]
}

/// `saturate(amount)`; values above 1 oversaturate.
pub fn saturate(amount: f32) -> ColorMatrix {
    let s = amount.max(0.0);
    [
        0.213 + 0.787 * s,
        0.715 - 0.715 * s,
        0.072 - 0.072 * s,
        0.0,
        0.0,
        0.213 - 0.213 * s,
        0.715 + 0.285 * s,
        0.072 - 0.072 * s,
        0.0,
        0.0,
        0.213 - 0.213 * s,
        0.715 - 0.715 * s,
        0.072 + 0.928 * s,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        1.0,
        0.0,
    ]
}

/// `sepia(amount)`, clamped to `0..=1`.
pub fn sepia(amount: f32) -> ColorMatrix {
    let k = 1.0 - amount.clamp(0.0, 1.0);
    [
        0.393 + 0.607 * k,
        0.769 - 0.769 * k,
        0.189 - 0.189 * k,
        0.0,
        0.0,
        0.349 - 0.349 * k,
        0.686 + 0.314 * k,
        0.168 - 0.168 * k,
        0.0,
        0.0,
        0.272 - 0.272 * k,
        0.534 - 0.534 * k,
        0.131 + 0.869 * k,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        1.0,
        0.0,
    ]
}

/// `grayscale(amount)`, clamped to `0..=1`.
pub fn grayscale(amount: f32) -> ColorMatrix {
    let k = 1.0 - amount.clamp(0.0, 1.0);
    [
        0.2126 + 0.7874 * k,
        0.7152 - 0.7152 * k,
        0.0722 - 0.0722 * k,
        0.0,
        0.0,
        0.2126 - 0.2126 * k,
        0.7152 + 0.2848 * k,
        0.0722 - 0.0722 * k,
        0.0,
        0.0,
        0.2126 - 0.2126 * k,
        0.7152 - 0.7152 * k,
        0.0722 + 0.9278 * k,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        1.0,
        0.0,
    ]
}

/// One step of a CSS filter chain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FilterStep {
    /// Gaussian blur with the given standard deviation in pixels.
    Blur(f32),
    /// Color matrix.
    Matrix(ColorMatrix),
}

/// Filter chain for a background: `blur(px) brightness(b)` followed by the preset.
pub fn background_chain(
    blur_px: f32,
    brightness_amount: f32,
    preset: FilterPreset,
    intensity: f32,
) -> Vec<FilterStep> {
    let i = intensity;
    let mut steps = vec![
        FilterStep::Blur(blur_px),
        FilterStep::Matrix(brightness(brightness_amount)),
    ];
    let preset_steps: &[ColorMatrix] = &match preset {
        FilterPreset::Original => return steps,
        FilterPreset::Cinematic => [contrast(1.0 + 0.2 * i), saturate(1.0 + 0.1 * i)],
        FilterPreset::Vintage => [sepia(0.5 * i), contrast(0.9 * i)],
        FilterPreset::Noir => [grayscale(i), contrast(1.2 * i)],
        FilterPreset::Dreamy => [brightness(1.0 + 0.1 * i), saturate(1.0 + 0.2 * i)],
        FilterPreset::Vivid => [saturate(1.0 + 0.5 * i), contrast(1.1 * i)],
    };
    steps.extend(preset_steps.iter().copied().map(FilterStep::Matrix));
    steps
}

/// Apply `steps` in order to a premultiplied buffer, clamping between steps.
pub fn apply_chain(
    src: &[u8],
    width: u32,
    height: u32,
    steps: &[FilterStep],
) -> StudioResult<Vec<u8>> {
    let mut cur = src.to_vec();
    for step in steps {
        match *step {
            FilterStep::Blur(sigma) => cur = blur_rgba8_premul(&cur, width, height, sigma)?,
            FilterStep::Matrix(m) if m == IDENTITY => {}
            FilterStep::Matrix(m) => color_matrix_in_place(&mut cur, m),
        }
    }
    Ok(cur)
}

/// Apply `m` to every premultiplied pixel of `buf`.
pub(crate) fn color_matrix_in_place(buf: &mut [u8], m: ColorMatrix) {
    buf.par_chunks_mut(4 * 4096).for_each(|chunk| {
        for px in chunk.chunks_exact_mut(4) {
            let out = color_matrix_px([px[0], px[1], px[2], px[3]], &m);
            px.copy_from_slice(&out);
        }
    });
}

fn color_matrix_px(s: [u8; 4], m: &ColorMatrix) -> [u8; 4] {
    let pa = f32::from(s[3]) / 255.0;
    let inv_a = if pa > 0.0 { 1.0 / pa } else { 0.0 };
    let r = f32::from(s[0]) / 255.0 * inv_a;
    let g = f32::from(s[1]) / 255.0 * inv_a;
    let b = f32::from(s[2]) / 255.0 * inv_a;
    let a = pa;

    let row = |o: usize| {
        (m[o] * r + m[o + 1] * g + m[o + 2] * b + m[o + 3] * a + m[o + 4]).clamp(0.0, 1.0)
    };
    let (out_r, out_g, out_b, out_a) = (row(0), row(5), row(10), row(15));

    let to_u8 = |v: f32| (v * 255.0).round().clamp(0.0, 255.0) as u8;
    [
        to_u8(out_r * out_a),
        to_u8(out_g * out_a),
        to_u8(out_b * out_a),
        to_u8(out_a),
    ]
}

#[cfg(test)]
#[path = "../../tests/unit/render/filter.rs"]
mod tests;
