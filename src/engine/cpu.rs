// ============================================================================
// CPU WARP ENGINE - rayon-parallel bulge/pinch with bilinear sampling
// ============================================================================

use image::RgbaImage;
use rayon::prelude::*;

use super::{EffectEngine, TextureHandle, WarpCanvas};

/// Always-available software engine.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuEngine;

impl EffectEngine for CpuEngine {
    fn name(&self) -> &str {
        "cpu"
    }

    fn create_canvas(&self) -> Result<Box<dyn WarpCanvas + '_>, String> {
        Ok(Box::new(CpuCanvas::default()))
    }
}

#[derive(Default)]
struct CpuCanvas {
    textures: Vec<RgbaImage>,
    current: Option<RgbaImage>,
}

impl WarpCanvas for CpuCanvas {
    fn upload_texture(&mut self, image: &RgbaImage) -> Result<TextureHandle, String> {
        self.textures.push(image.clone());
        Ok(TextureHandle(self.textures.len() as u32 - 1))
    }

    fn draw(&mut self, texture: TextureHandle) -> Result<(), String> {
        let tex = self
            .textures
            .get(texture.0 as usize)
            .ok_or_else(|| format!("unknown texture {}", texture.0))?;
        self.current = Some(tex.clone());
        Ok(())
    }

    fn bulge_pinch(&mut self, center_x: f32, center_y: f32, radius: f32, strength: f32) {
        if let Some(cur) = self.current.as_ref() {
            let warped = bulge_pinch_core(cur, center_x, center_y, radius, strength);
            self.current = Some(warped);
        }
    }

    fn update(&mut self) -> Result<(), String> {
        if self.current.is_none() {
            return Err("nothing drawn".to_string());
        }
        Ok(())
    }

    fn width(&self) -> u32 {
        self.current.as_ref().map_or(0, |i| i.width())
    }

    fn height(&self) -> u32 {
        self.current.as_ref().map_or(0, |i| i.height())
    }

    fn into_image(self: Box<Self>) -> RgbaImage {
        self.current.unwrap_or_else(|| RgbaImage::new(0, 0))
    }
}

/// Where the output pixel center (px, py) samples from. Both in pixel-center space.
#[inline]
pub(crate) fn warp_source(px: f32, py: f32, cx: f32, cy: f32, radius: f32, strength: f32) -> (f32, f32) {
    let dx = px - cx;
    let dy = py - cy;
    let dist = (dx * dx + dy * dy).sqrt();
    if dist >= radius || dist <= f32::EPSILON {
        return (px, py);
    }
    let percent = dist / radius;
    let factor = if strength > 0.0 {
        // Bulge: sample closer to the center, magnifying it
        lerp(1.0, smoothstep(0.0, radius / dist, percent), strength * 0.75)
    } else {
        // Pinch: sample farther out, shrinking the middle
        lerp(1.0, percent.powf(1.0 + strength * 0.75) * radius / dist, 1.0 - percent)
    };
    (cx + dx * factor, cy + dy * factor)
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Warp a whole image. Pixels outside `radius` are copied unchanged.
pub fn bulge_pinch_core(src: &RgbaImage, cx: f32, cy: f32, radius: f32, strength: f32) -> RgbaImage {
    let w = src.width() as usize;
    let h = src.height() as usize;
    if w == 0 || h == 0 || radius <= 0.0 || strength == 0.0 || !radius.is_finite() {
        return src.clone();
    }

    let src_raw = src.as_raw();
    let stride = w * 4;
    let mut dst_raw = vec![0u8; w * h * 4];

    dst_raw
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row_out)| {
            let row_in = &src_raw[y * stride..(y + 1) * stride];
            let py = y as f32 + 0.5;
            for x in 0..w {
                let pi = x * 4;
                let px = x as f32 + 0.5;
                let (sx, sy) = warp_source(px, py, cx, cy, radius, strength);
                if sx == px && sy == py {
                    row_out[pi..pi + 4].copy_from_slice(&row_in[pi..pi + 4]);
                    continue;
                }
                let p = sample_bilinear(src, sx - 0.5, sy - 0.5);
                for c in 0..4 {
                    row_out[pi + c] = p[c].round().clamp(0.0, 255.0) as u8;
                }
            }
        });

    RgbaImage::from_raw(w as u32, h as u32, dst_raw).unwrap_or_else(|| src.clone())
}

/// Clamp-sample a pixel (edge pixels repeat outward).
#[inline]
fn sample_clamped(img: &RgbaImage, x: i32, y: i32) -> [f32; 4] {
    let cx = x.clamp(0, img.width() as i32 - 1) as u32;
    let cy = y.clamp(0, img.height() as i32 - 1) as u32;
    let p = img.get_pixel(cx, cy);
    [p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32]
}

/// Bilinear-sample at fractional pixel coordinates.
#[inline]
fn sample_bilinear(img: &RgbaImage, fx: f32, fy: f32) -> [f32; 4] {
    let x0 = fx.floor() as i32;
    let y0 = fy.floor() as i32;
    let dx = fx - x0 as f32;
    let dy = fy - y0 as f32;

    let p00 = sample_clamped(img, x0, y0);
    let p10 = sample_clamped(img, x0 + 1, y0);
    let p01 = sample_clamped(img, x0, y0 + 1);
    let p11 = sample_clamped(img, x0 + 1, y0 + 1);

    let mut out = [0.0f32; 4];
    for c in 0..4 {
        out[c] = p00[c] * (1.0 - dx) * (1.0 - dy)
            + p10[c] * dx * (1.0 - dy)
            + p01[c] * (1.0 - dx) * dy
            + p11[c] * dx * dy;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    /// Horizontal gradient so warps visibly move pixels.
    fn gradient(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            Rgba([(x * 255 / w.max(1)) as u8, (y * 255 / h.max(1)) as u8, 128, 255])
        })
    }

    #[test]
    fn zero_strength_is_identity() {
        let img = gradient(64, 48);
        assert_eq!(bulge_pinch_core(&img, 32.0, 24.0, 20.0, 0.0), img);
    }

    #[test]
    fn zero_radius_is_identity() {
        let img = gradient(64, 48);
        assert_eq!(bulge_pinch_core(&img, 32.0, 24.0, 0.0, 0.8), img);
    }

    #[test]
    fn pixels_outside_radius_untouched() {
        let img = gradient(80, 80);
        for strength in [0.8f32, -0.8] {
            let out = bulge_pinch_core(&img, 40.0, 40.0, 10.0, strength);
            for (x, y, px) in out.enumerate_pixels() {
                let dx = x as f32 + 0.5 - 40.0;
                let dy = y as f32 + 0.5 - 40.0;
                if (dx * dx + dy * dy).sqrt() >= 10.0 {
                    assert_eq!(px, img.get_pixel(x, y), "changed at ({x}, {y})");
                }
            }
            assert_ne!(out, img);
        }
    }

    #[test]
    fn bulge_pulls_samples_toward_center() {
        let (sx, _) = warp_source(45.0, 40.0, 40.0, 40.0, 20.0, 1.0);
        assert!(sx < 45.0 && sx > 40.0);
    }

    #[test]
    fn pinch_pushes_samples_outward() {
        let (sx, _) = warp_source(45.0, 40.0, 40.0, 40.0, 20.0, -1.0);
        assert!(sx > 45.0);
    }

    #[test]
    fn canvas_keeps_source_dimensions() {
        let engine = CpuEngine;
        let mut canvas = engine.create_canvas().unwrap();
        let img = gradient(30, 20);
        let tex = canvas.upload_texture(&img).unwrap();
        canvas.draw(tex).unwrap();
        canvas.bulge_pinch(15.0, 10.0, 8.0, 0.5);
        canvas.update().unwrap();
        assert_eq!((canvas.width(), canvas.height()), (30, 20));
        assert_eq!(canvas.into_image().dimensions(), (30, 20));
    }

    #[test]
    fn drawing_unknown_texture_fails() {
        let engine = CpuEngine;
        let mut canvas = engine.create_canvas().unwrap();
        assert!(canvas.draw(TextureHandle(3)).is_err());
        assert!(canvas.update().is_err());
    }
}
