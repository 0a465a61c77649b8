// ============================================================================
// FALLBACK ENGINE - primary backend with a CPU retry for refused images
// ============================================================================
//
// The GPU refuses images beyond its texture or buffer limits at upload time.
// Under the Auto backend that image is warped on the CPU instead of failing.
// ============================================================================

use image::RgbaImage;

use super::{CpuEngine, EffectEngine, TextureHandle, WarpCanvas};

pub struct FallbackEngine {
    primary: Box<dyn EffectEngine>,
    fallback: CpuEngine,
}

impl FallbackEngine {
    pub fn new(primary: Box<dyn EffectEngine>) -> Self {
        Self { primary, fallback: CpuEngine }
    }
}

impl EffectEngine for FallbackEngine {
    fn name(&self) -> &str {
        self.primary.name()
    }

    fn adapter(&self) -> Option<&str> {
        self.primary.adapter()
    }

    fn create_canvas(&self) -> Result<Box<dyn WarpCanvas + '_>, String> {
        match self.primary.create_canvas() {
            Ok(inner) => Ok(Box::new(FallbackCanvas {
                inner,
                fallback: &self.fallback,
                uploads: 0,
                on_fallback: false,
            })),
            Err(e) => {
                crate::log_warn!("{} engine has no canvas ({}), using CPU", self.primary.name(), e);
                self.fallback.create_canvas()
            }
        }
    }
}

struct FallbackCanvas<'a> {
    inner: Box<dyn WarpCanvas + 'a>,
    fallback: &'a CpuEngine,
    uploads: u32,
    on_fallback: bool,
}

impl WarpCanvas for FallbackCanvas<'_> {
    fn upload_texture(&mut self, image: &RgbaImage) -> Result<TextureHandle, String> {
        match self.inner.upload_texture(image) {
            Ok(handle) => {
                self.uploads += 1;
                Ok(handle)
            }
            // Handles from the primary canvas would not survive a switch
            Err(e) if !self.on_fallback && self.uploads == 0 => {
                crate::log_warn!(
                    "Primary engine refused {}x{} ({}), retrying on CPU",
                    image.width(),
                    image.height(),
                    e
                );
                let fallback = self.fallback;
                self.inner = fallback.create_canvas()?;
                self.on_fallback = true;
                let handle = self.inner.upload_texture(image)?;
                self.uploads += 1;
                Ok(handle)
            }
            Err(e) => Err(e),
        }
    }

    fn draw(&mut self, texture: TextureHandle) -> Result<(), String> {
        self.inner.draw(texture)
    }

    fn bulge_pinch(&mut self, center_x: f32, center_y: f32, radius: f32, strength: f32) {
        self.inner.bulge_pinch(center_x, center_y, radius, strength)
    }

    fn update(&mut self) -> Result<(), String> {
        self.inner.update()
    }

    fn width(&self) -> u32 {
        self.inner.width()
    }

    fn height(&self) -> u32 {
        self.inner.height()
    }

    fn into_image(self: Box<Self>) -> RgbaImage {
        self.inner.into_image()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::tests::{Call, RecordingEngine};
    use crate::effect::{EffectKind, EffectRadius, WarpRequest, apply_effect};
    use crate::mapper::ImagePoint;

    fn request() -> WarpRequest {
        WarpRequest {
            kind: EffectKind::Bulge,
            center: ImagePoint::new(20.0, 15.0),
            radius: EffectRadius::Fraction(0.5),
            strength: 0.5,
        }
    }

    #[test]
    fn refused_upload_is_warped_on_cpu() {
        let primary = RecordingEngine { refuse_upload: true, ..Default::default() };
        let calls = primary.calls.clone();
        let engine = FallbackEngine::new(Box::new(primary));
        let img = RgbaImage::from_pixel(40, 30, image::Rgba([9, 9, 9, 255]));

        let out = apply_effect(Some(&engine), &img, &request()).unwrap();
        assert_eq!(out.dimensions(), (40, 30));
        // The primary saw the upload attempt and nothing after it
        assert_eq!(*calls.borrow(), vec![Call::Upload(40, 30)]);
    }

    #[test]
    fn refused_canvas_falls_back_to_cpu() {
        let primary = RecordingEngine { refuse_canvas: true, ..Default::default() };
        let engine = FallbackEngine::new(Box::new(primary));
        let img = RgbaImage::new(16, 16);
        assert_eq!(apply_effect(Some(&engine), &img, &request()).unwrap().dimensions(), (16, 16));
    }

    #[test]
    fn accepted_upload_stays_on_primary() {
        let primary = RecordingEngine::default();
        let calls = primary.calls.clone();
        let engine = FallbackEngine::new(Box::new(primary));
        apply_effect(Some(&engine), &RgbaImage::new(8, 8), &request()).unwrap();
        assert!(calls.borrow().contains(&Call::Update));
        assert_eq!(engine.name(), "recording");
    }
}
