use rayon::prelude::*;

use crate::foundation::error::{StudioError, StudioResult};

/// Largest sigma blurred at full resolution; wider blurs run on a downscaled copy.
const MAX_DIRECT_SIGMA: f32 = 4.0;
/// Widest kernel radius [`gaussian_kernel_q16`] builds.
const MAX_KERNEL_RADIUS: u32 = 4096;

/// Gaussian blur of a premultiplied RGBA8 buffer, matching CSS `blur(<sigma>px)`.
///
/// A sigma of zero (or below) copies the input unchanged.
pub fn blur_rgba8_premul(
    src: &[u8],
    width: u32,
    height: u32,
    sigma: f32,
) -> StudioResult<Vec<u8>> {
    check_len(src, width, height)?;
    if !sigma.is_finite() {
        return Err(StudioError::validation("blur sigma must be finite"));
    }
    if sigma <= 0.0 || width == 0 || height == 0 {
        return Ok(src.to_vec());
    }
    if sigma <= MAX_DIRECT_SIGMA {
        return blur_direct(src, width, height, sigma);
    }

    let factor = ((sigma / MAX_DIRECT_SIGMA).ceil() as u32).clamp(1, width.max(height));
    let (small, sw, sh) = downscale_box(src, width, height, factor);
    let blurred = blur_direct(&small, sw, sh, (sigma / factor as f32).min(MAX_DIRECT_SIGMA))?;
    Ok(upscale_bilinear(&blurred, sw, sh, width, height))
}

fn check_len(src: &[u8], width: u32, height: u32) -> StudioResult<()> {
    let expected = (width as usize)
        .saturating_mul(height as usize)
        .saturating_mul(4);
    if src.len() != expected {
        return Err(StudioError::render(format!(
            "blur input byte len mismatch: got {}, expected {expected}",
            src.len()
        )));
    }
    Ok(())
}

fn blur_direct(src: &[u8], width: u32, height: u32, sigma: f32) -> StudioResult<Vec<u8>> {
    let radius = (sigma * 3.0).ceil().max(1.0) as u32;
    let kernel = gaussian_kernel_q16(radius, sigma)?;
    let mut tmp = vec![0u8; src.len()];
    let mut dst = vec![0u8; src.len()];
    horizontal_blur_q16(src, &mut tmp, width, &kernel);
    vertical_blur_q16(&tmp, &mut dst, width, height, &kernel);
    Ok(dst)
}

/// Normalized gaussian weights in Q16 fixed point, summing to exactly `1 << 16`.
pub(crate) fn gaussian_kernel_q16(radius: u32, sigma: f32) -> StudioResult<Vec<u32>> {
    if radius == 0 {
        return Ok(vec![1 << 16]);
    }
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(StudioError::validation("blur sigma must be finite and > 0"));
    }
    if radius > MAX_KERNEL_RADIUS {
        return Err(StudioError::validation(format!(
            "blur radius {radius} exceeds {MAX_KERNEL_RADIUS}"
        )));
    }

    let r = radius as i32;
    let denom = 2.0 * f64::from(sigma) * f64::from(sigma);
    let weights_f: Vec<f64> = (-r..=r)
        .map(|i| {
            let x = f64::from(i);
            (-x * x / denom).exp()
        })
        .collect();
    let sum: f64 = weights_f.iter().sum();
    if sum <= 0.0 {
        return Err(StudioError::render("gaussian kernel sum is zero"));
    }

    let mut weights: Vec<u32> = weights_f
        .iter()
        .map(|wf| ((wf / sum) * 65536.0).round().clamp(0.0, 65536.0) as u32)
        .collect();
    let acc: i64 = weights.iter().map(|&w| i64::from(w)).sum();
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        weights[mid] = (i64::from(weights[mid]) + delta).clamp(0, 65536) as u32;
    }
    Ok(weights)
}

fn horizontal_blur_q16(src: &[u8], dst: &mut [u8], width: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i64;
    let w = i64::from(width);
    let stride = width as usize * 4;
    dst.par_chunks_mut(stride)
        .zip(src.par_chunks(stride))
        .for_each(|(out_row, row)| {
            for x in 0..w {
                let mut acc = [0u64; 4];
                for (ki, &kw) in k.iter().enumerate() {
                    let sx = (x + ki as i64 - radius).clamp(0, w - 1) as usize * 4;
                    for c in 0..4 {
                        acc[c] += u64::from(kw) * u64::from(row[sx + c]);
                    }
                }
                let o = x as usize * 4;
                for c in 0..4 {
                    out_row[o + c] = q16_to_u8(acc[c]);
                }
            }
        });
}

fn vertical_blur_q16(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i64;
    let h = i64::from(height);
    let stride = width as usize * 4;
    dst.par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, out_row)| {
            for (x, out_px) in out_row.chunks_exact_mut(4).enumerate() {
                let mut acc = [0u64; 4];
                for (ki, &kw) in k.iter().enumerate() {
                    let sy = (y as i64 + ki as i64 - radius).clamp(0, h - 1) as usize;
                    let idx = sy * stride + x * 4;
                    for c in 0..4 {
                        acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                    }
                }
                for c in 0..4 {
                    out_px[c] = q16_to_u8(acc[c]);
                }
            }
        });
}

fn q16_to_u8(acc: u64) -> u8 {
    ((acc + 32768) >> 16).min(255) as u8
}

fn downscale_box(src: &[u8], width: u32, height: u32, factor: u32) -> (Vec<u8>, u32, u32) {
    let sw = width.div_ceil(factor).max(1);
    let sh = height.div_ceil(factor).max(1);
    let in_stride = width as usize * 4;
    let mut out = vec![0u8; sw as usize * sh as usize * 4];
    out.par_chunks_mut(sw as usize * 4)
        .enumerate()
        .for_each(|(sy, out_row)| {
            let y0 = sy as u32 * factor;
            let y1 = (y0 + factor).min(height);
            for (sx, out_px) in out_row.chunks_exact_mut(4).enumerate() {
                let x0 = sx as u32 * factor;
                let x1 = (x0 + factor).min(width);
                let mut acc = [0u32; 4];
                let mut n = 0u32;
                for y in y0..y1 {
                    for x in x0..x1 {
                        let i = y as usize * in_stride + x as usize * 4;
                        for c in 0..4 {
                            acc[c] += u32::from(src[i + c]);
                        }
                        n += 1;
                    }
                }
                let n = n.max(1);
                for c in 0..4 {
                    out_px[c] = ((acc[c] + n / 2) / n) as u8;
                }
            }
        });
    (out, sw, sh)
}

fn upscale_bilinear(src: &[u8], sw: u32, sh: u32, width: u32, height: u32) -> Vec<u8> {
    let sx_scale = sw as f32 / width as f32;
    let sy_scale = sh as f32 / height as f32;
    let in_stride = sw as usize * 4;
    let mut out = vec![0u8; width as usize * height as usize * 4];
    out.par_chunks_mut(width as usize * 4)
        .enumerate()
        .for_each(|(y, out_row)| {
            let fy = ((y as f32 + 0.5) * sy_scale - 0.5).clamp(0.0, (sh - 1) as f32);
            let y0 = fy.floor() as usize;
            let y1 = (y0 + 1).min(sh as usize - 1);
            let ty = fy - y0 as f32;
            for (x, out_px) in out_row.chunks_exact_mut(4).enumerate() {
                let fx = ((x as f32 + 0.5) * sx_scale - 0.5).clamp(0.0, (sw - 1) as f32);
                let x0 = fx.floor() as usize;
                let x1 = (x0 + 1).min(sw as usize - 1);
                let tx = fx - x0 as f32;
                for c in 0..4 {
                    let p = |xx: usize, yy: usize| f32::from(src[yy * in_stride + xx * 4 + c]);
                    let top = p(x0, y0) * (1.0 - tx) + p(x1, y0) * tx;
                    let bot = p(x0, y1) * (1.0 - tx) + p(x1, y1) * tx;
                    out_px[c] = (top * (1.0 - ty) + bot * ty).round().clamp(0.0, 255.0) as u8;
                }
            }
        });
    out
}

#[cfg(test)]
#[path = "../../tests/unit/render/blur.rs"]
mod tests;
