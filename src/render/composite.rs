use rayon::prelude::*;

use crate::foundation::error::{StudioError, StudioResult};
use crate::foundation::math::{add_sat_u8, mul_div255_u8};

/// Separable blend modes used by the scene layers and screen effects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Plain source-over.
    #[default]
    Normal,
    /// `s * d`
    Multiply,
    /// `s + d - s * d`
    Screen,
    /// Hard light with the operands swapped.
    Overlay,
    /// `max(s, d)`
    Lighten,
    /// `d / (1 - s)`
    ColorDodge,
}

/// Pixels per parallel work item.
const PAR_CHUNK_PX: usize = 16 * 1024;

/// Composite premultiplied `src` over `dst` with a global `opacity` and `blend` mode.
pub fn composite_over_rgba8_premul(
    dst: &mut [u8],
    src: &[u8],
    opacity: f32,
    blend: BlendMode,
) -> StudioResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(StudioError::render(
            "composite_over_rgba8_premul expects equal-length rgba8 buffers",
        ));
    }

    // Blend dispatch happens once per call; each branch monomorphizes its kernel.
    match blend {
        BlendMode::Normal => premul_over_in_place_opacity(dst, src, opacity),
        BlendMode::Multiply => composite_over_rgba8_premul_blend(dst, src, opacity, |s, d| s * d),
        BlendMode::Screen => {
            composite_over_rgba8_premul_blend(dst, src, opacity, |s, d| s + d - s * d)
        }
        BlendMode::Overlay => composite_over_rgba8_premul_blend(dst, src, opacity, |s, d| {
            if d <= 0.5 {
                2.0 * s * d
            } else {
                1.0 - 2.0 * (1.0 - s) * (1.0 - d)
            }
        }),
        BlendMode::Lighten => composite_over_rgba8_premul_blend(dst, src, opacity, |s, d| s.max(d)),
        BlendMode::ColorDodge => composite_over_rgba8_premul_blend(dst, src, opacity, |s, d| {
            if d <= 0.0 {
                0.0
            } else if s >= 1.0 {
                1.0
            } else {
                (d / (1.0 - s)).min(1.0)
            }
        }),
    }
    Ok(())
}

fn premul_over_in_place_opacity(dst: &mut [u8], src: &[u8], opacity: f32) {
    let op = ((opacity.clamp(0.0, 1.0) * 255.0).round() as i32).clamp(0, 255) as u16;
    if op == 0 {
        return;
    }

    dst.par_chunks_mut(PAR_CHUNK_PX * 4)
        .zip(src.par_chunks(PAR_CHUNK_PX * 4))
        .for_each(|(dst, src)| {
            for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
                let sa = mul_div255_u8(u16::from(s[3]), op);
                if sa == 0 {
                    continue;
                }
                let inv = 255u16 - u16::from(sa);

                d[3] = add_sat_u8(sa, mul_div255_u8(u16::from(d[3]), inv));
                for c in 0..3 {
                    let sc = mul_div255_u8(u16::from(s[c]), op);
                    let dc = mul_div255_u8(u16::from(d[c]), inv);
                    d[c] = add_sat_u8(sc, dc);
                }
            }
        });
}

#[inline(always)]
fn composite_over_rgba8_premul_blend<F>(dst: &mut [u8], src: &[u8], opacity: f32, blend_fn: F)
where
    F: Fn(f32, f32) -> f32 + Sync,
{
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 {
        return;
    }

    dst.par_chunks_mut(PAR_CHUNK_PX * 4)
        .zip(src.par_chunks(PAR_CHUNK_PX * 4))
        .for_each(|(dst, src)| {
            for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
                if s[3] == 0 {
                    continue;
                }
                blend_px(d, s, opacity, &blend_fn);
            }
        });
}

/// Porter-Duff source-over with `blend_fn` applied to unpremultiplied channels:
/// `out_a = sa + da * (1 - sa)`, `out_p = sp * (1 - da) + dp * (1 - sa) + B(sc, dc) * sa * da`.
#[inline(always)]
fn blend_px<F>(d: &mut [u8], s: &[u8], opacity: f32, blend_fn: &F)
where
    F: Fn(f32, f32) -> f32,
{
    let sa = (s[3] as f32 / 255.0) * opacity;
    let da = d[3] as f32 / 255.0;
    let out_a = (sa + da * (1.0 - sa)).clamp(0.0, 1.0);

    for c in 0..3 {
        let sp = (s[c] as f32 / 255.0) * opacity;
        let dp = d[c] as f32 / 255.0;
        let sc = if sa > 0.0 { (sp / sa).clamp(0.0, 1.0) } else { 0.0 };
        let dc = if da > 0.0 { (dp / da).clamp(0.0, 1.0) } else { 0.0 };
        let b = blend_fn(sc, dc).clamp(0.0, 1.0);
        let out = (sp * (1.0 - da) + dp * (1.0 - sa) + b * sa * da).clamp(0.0, 1.0);
        d[c] = (out * 255.0).round() as u8;
    }
    d[3] = (out_a * 255.0).round() as u8;
}

/// Composite a constant premultiplied color over the pixel rectangle `[x0,x1) x [y0,y1)`.
///
/// The rectangle is clipped to the surface.
#[allow(clippy::too_many_arguments)]
pub(crate) fn fill_rect_blend(
    dst: &mut [u8],
    width: u32,
    height: u32,
    (x0, y0, x1, y1): (i64, i64, i64, i64),
    color: [u8; 4],
    opacity: f32,
    blend: BlendMode,
) -> StudioResult<()> {
    let x0 = x0.clamp(0, i64::from(width)) as usize;
    let x1 = x1.clamp(0, i64::from(width)) as usize;
    let y0 = y0.clamp(0, i64::from(height)) as usize;
    let y1 = y1.clamp(0, i64::from(height)) as usize;
    if x0 >= x1 || y0 >= y1 {
        return Ok(());
    }
    let stride = width as usize * 4;
    let mut row = vec![0u8; (x1 - x0) * 4];
    for px in row.chunks_exact_mut(4) {
        px.copy_from_slice(&color);
    }
    for y in y0..y1 {
        let start = y * stride + x0 * 4;
        let end = y * stride + x1 * 4;
        composite_over_rgba8_premul(&mut dst[start..end], &row, opacity, blend)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/render/composite.rs"]
mod tests;
