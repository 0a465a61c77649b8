// ============================================================================
// EFFECT INVOKER - drives an injected engine through the bulge/pinch sequence
// ============================================================================
//
// Bulge and pinch are the same warp primitive; pinch flips the strength sign.
// The engine is passed in explicitly (and may be absent), so nothing here
// reads global state and tests can substitute a recording engine.
// ============================================================================

use image::RgbaImage;

use crate::engine::{EffectEngine, WarpCanvas};
use crate::mapper::ImagePoint;

/// Which direction the warp pushes pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum EffectKind {
    #[default]
    Bulge,
    Pinch,
}

impl EffectKind {
    pub const ALL: [EffectKind; 2] = [EffectKind::Bulge, EffectKind::Pinch];

    pub fn label(&self) -> &'static str {
        match self {
            EffectKind::Bulge => "Bulge",
            EffectKind::Pinch => "Pinch",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EffectKind::Bulge => "bulge",
            EffectKind::Pinch => "pinch",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "bulge" => Some(EffectKind::Bulge),
            "pinch" => Some(EffectKind::Pinch),
            _ => None,
        }
    }

    /// Strength as handed to the warp primitive.
    pub fn signed_strength(&self, strength: f32) -> f32 {
        match self {
            EffectKind::Bulge => strength,
            EffectKind::Pinch => -strength,
        }
    }
}

/// Warp radius with an explicit unit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EffectRadius {
    /// Fraction of `min(width, height)`.
    Fraction(f32),
    /// Absolute native pixels.
    Pixels(f32),
}

impl EffectRadius {
    pub fn resolve(&self, width: u32, height: u32) -> f32 {
        match *self {
            EffectRadius::Fraction(f) => f.max(0.0) * width.min(height) as f32,
            EffectRadius::Pixels(px) => px.max(0.0),
        }
    }
}

pub const STRENGTH_RANGE: std::ops::RangeInclusive<f32> = -1.0..=1.0;
pub const RADIUS_RANGE: std::ops::RangeInclusive<f32> = 0.0..=1.0;
/// Slider step for both strength and radius.
pub const PARAM_STEP: f64 = 0.01;

/// Values the controls edit. `radius` is a fraction of the smaller image side.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectParameters {
    pub kind: EffectKind,
    strength: f32,
    radius: f32,
}

impl Default for EffectParameters {
    fn default() -> Self {
        Self {
            kind: EffectKind::Bulge,
            strength: 0.5,
            radius: 0.5,
        }
    }
}

impl EffectParameters {
    pub fn new(kind: EffectKind, strength: f32, radius: f32) -> Self {
        let mut p = Self { kind, strength: 0.0, radius: 0.0 };
        p.set_strength(strength);
        p.set_radius(radius);
        p
    }

    pub fn strength(&self) -> f32 {
        self.strength
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn set_strength(&mut self, strength: f32) {
        self.strength = clamp_or(strength, *STRENGTH_RANGE.start(), *STRENGTH_RANGE.end(), 0.0);
    }

    pub fn set_radius(&mut self, radius: f32) {
        self.radius = clamp_or(radius, *RADIUS_RANGE.start(), *RADIUS_RANGE.end(), 0.0);
    }

    pub fn effect_radius(&self) -> EffectRadius {
        EffectRadius::Fraction(self.radius)
    }
}

fn clamp_or(v: f32, lo: f32, hi: f32, fallback: f32) -> f32 {
    if v.is_finite() { v.clamp(lo, hi) } else { fallback }
}

/// Errors from applying an effect.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectError {
    /// No engine, or the engine could not provide a canvas.
    EngineUnavailable(String),
    /// The engine started but failed partway through.
    EngineFailed(String),
    ImageNotLoaded,
    NoSelection,
}

impl std::fmt::Display for EffectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EffectError::EngineUnavailable(e) => write!(f, "Effect engine unavailable: {}", e),
            EffectError::EngineFailed(e) => write!(f, "Effect engine failed: {}", e),
            EffectError::ImageNotLoaded => write!(f, "No image loaded"),
            EffectError::NoSelection => write!(f, "Nothing selected"),
        }
    }
}

impl std::error::Error for EffectError {}

/// One fully-resolved invocation of the warp.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WarpRequest {
    pub kind: EffectKind,
    pub center: ImagePoint,
    pub radius: EffectRadius,
    pub strength: f32,
}

impl WarpRequest {
    pub fn from_parameters(params: &EffectParameters, center: ImagePoint) -> Self {
        Self {
            kind: params.kind,
            center,
            radius: params.effect_radius(),
            strength: params.strength(),
        }
    }
}

/// Run `request` on `image` through `engine` and return the rendered surface.
///
/// The result always has the source dimensions. An absent engine is reported
/// as [`EffectError::EngineUnavailable`].
pub fn apply_effect(
    engine: Option<&dyn EffectEngine>,
    image: &RgbaImage,
    request: &WarpRequest,
) -> Result<RgbaImage, EffectError> {
    let Some(engine) = engine else {
        crate::log_err!("apply_effect: no effect engine installed");
        return Err(EffectError::EngineUnavailable("no engine installed".to_string()));
    };

    let mut canvas = engine.create_canvas().map_err(|e| {
        crate::log_err!("apply_effect: {} engine cannot create a canvas: {}", engine.name(), e);
        EffectError::EngineUnavailable(e)
    })?;

    let radius = request.radius.resolve(image.width(), image.height());
    let strength = request.kind.signed_strength(request.strength);
    run_sequence(canvas.as_mut(), image, request.center, radius, strength)?;

    let reported = (canvas.width(), canvas.height());
    if reported != image.dimensions() {
        return Err(size_mismatch(reported, image));
    }
    let out = canvas.into_image();
    if out.dimensions() != image.dimensions() {
        return Err(size_mismatch(out.dimensions(), image));
    }
    crate::log_info!(
        "{} via {} at ({:.1}, {:.1}) r={:.1} s={:.2}",
        request.kind.label(),
        engine.name(),
        request.center.x,
        request.center.y,
        radius,
        strength
    );
    Ok(out)
}

fn size_mismatch((w, h): (u32, u32), source: &RgbaImage) -> EffectError {
    crate::log_err!("apply_effect: engine produced {}x{} for {}x{}", w, h, source.width(), source.height());
    EffectError::EngineFailed(format!(
        "engine returned {}x{} for a {}x{} source",
        w,
        h,
        source.width(),
        source.height()
    ))
}

fn run_sequence(
    canvas: &mut dyn WarpCanvas,
    image: &RgbaImage,
    center: ImagePoint,
    radius: f32,
    strength: f32,
) -> Result<(), EffectError> {
    let texture = canvas
        .upload_texture(image)
        .map_err(EffectError::EngineUnavailable)?;
    canvas.draw(texture).map_err(EffectError::EngineFailed)?;
    canvas.bulge_pinch(center.x, center.y, radius, strength);
    canvas.update().map_err(EffectError::EngineFailed)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::engine::TextureHandle;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Every call a recording canvas received, in order.
    #[derive(Clone, Debug, PartialEq)]
    pub(crate) enum Call {
        Upload(u32, u32),
        Draw(TextureHandle),
        BulgePinch { cx: f32, cy: f32, radius: f32, strength: f32 },
        Update,
    }

    /// Engine double that records calls and returns the uploaded image unchanged.
    /// The flags make it fail at one step of the sequence.
    #[derive(Default)]
    pub(crate) struct RecordingEngine {
        pub calls: Rc<RefCell<Vec<Call>>>,
        pub refuse_canvas: bool,
        pub refuse_upload: bool,
        pub fail_update: bool,
        /// Canvas ends up half the source width.
        pub shrink_output: bool,
    }

    struct RecordingCanvas {
        calls: Rc<RefCell<Vec<Call>>>,
        image: Option<RgbaImage>,
        refuse_upload: bool,
        fail_update: bool,
        shrink_output: bool,
    }

    impl EffectEngine for RecordingEngine {
        fn name(&self) -> &str {
            "recording"
        }

        fn create_canvas(&self) -> Result<Box<dyn WarpCanvas + '_>, String> {
            if self.refuse_canvas {
                return Err("refused".to_string());
            }
            Ok(Box::new(RecordingCanvas {
                calls: self.calls.clone(),
                image: None,
                refuse_upload: self.refuse_upload,
                fail_update: self.fail_update,
                shrink_output: self.shrink_output,
            }))
        }
    }

    impl WarpCanvas for RecordingCanvas {
        fn upload_texture(&mut self, image: &RgbaImage) -> Result<TextureHandle, String> {
            self.calls.borrow_mut().push(Call::Upload(image.width(), image.height()));
            if self.refuse_upload {
                return Err("too large".to_string());
            }
            self.image = Some(image.clone());
            Ok(TextureHandle(7))
        }

        fn draw(&mut self, texture: TextureHandle) -> Result<(), String> {
            self.calls.borrow_mut().push(Call::Draw(texture));
            Ok(())
        }

        fn bulge_pinch(&mut self, cx: f32, cy: f32, radius: f32, strength: f32) {
            self.calls.borrow_mut().push(Call::BulgePinch { cx, cy, radius, strength });
        }

        fn update(&mut self) -> Result<(), String> {
            self.calls.borrow_mut().push(Call::Update);
            if self.fail_update {
                return Err("device lost".to_string());
            }
            if self.shrink_output
                && let Some(img) = self.image.take()
            {
                let half = img.width() / 2;
                self.image = Some(image::imageops::crop_imm(&img, 0, 0, half, img.height()).to_image());
            }
            Ok(())
        }

        fn width(&self) -> u32 {
            self.image.as_ref().map_or(0, |i| i.width())
        }

        fn height(&self) -> u32 {
            self.image.as_ref().map_or(0, |i| i.height())
        }

        fn into_image(self: Box<Self>) -> RgbaImage {
            self.image.unwrap_or_else(|| RgbaImage::new(0, 0))
        }
    }

    fn request(kind: EffectKind, strength: f32) -> WarpRequest {
        WarpRequest {
            kind,
            center: ImagePoint::new(100.0, 150.0),
            radius: EffectRadius::Fraction(0.5),
            strength,
        }
    }

    fn warp_calls(engine: &RecordingEngine) -> Vec<Call> {
        engine
            .calls
            .borrow()
            .iter()
            .filter(|c| matches!(c, Call::BulgePinch { .. }))
            .cloned()
            .collect()
    }

    #[test]
    fn follows_capability_call_order() {
        let engine = RecordingEngine::default();
        let img = RgbaImage::new(400, 300);
        let out = apply_effect(Some(&engine), &img, &request(EffectKind::Bulge, 0.5)).unwrap();
        assert_eq!(out.dimensions(), (400, 300));
        assert_eq!(
            *engine.calls.borrow(),
            vec![
                Call::Upload(400, 300),
                Call::Draw(TextureHandle(7)),
                Call::BulgePinch { cx: 100.0, cy: 150.0, radius: 150.0, strength: 0.5 },
                Call::Update,
            ]
        );
    }

    #[test]
    fn pinch_equals_bulge_with_negated_strength() {
        let img = RgbaImage::new(400, 300);
        for s in [-1.0f32, -0.3, 0.0, 0.25, 1.0] {
            let pinch = RecordingEngine::default();
            let bulge = RecordingEngine::default();
            apply_effect(Some(&pinch), &img, &request(EffectKind::Pinch, s)).unwrap();
            apply_effect(Some(&bulge), &img, &request(EffectKind::Bulge, -s)).unwrap();
            assert_eq!(warp_calls(&pinch), warp_calls(&bulge));
        }
    }

    #[test]
    fn missing_engine_is_reported_not_fatal() {
        let img = RgbaImage::new(4, 4);
        let err = apply_effect(None, &img, &request(EffectKind::Bulge, 0.5)).unwrap_err();
        assert!(matches!(err, EffectError::EngineUnavailable(_)));

        let refusing = RecordingEngine { refuse_canvas: true, ..Default::default() };
        let err = apply_effect(Some(&refusing), &img, &request(EffectKind::Pinch, 0.5)).unwrap_err();
        assert!(matches!(err, EffectError::EngineUnavailable(_)));
        assert!(refusing.calls.borrow().is_empty());
    }

    #[test]
    fn refused_upload_is_engine_unavailable() {
        let engine = RecordingEngine { refuse_upload: true, ..Default::default() };
        let err = apply_effect(Some(&engine), &RgbaImage::new(4, 4), &request(EffectKind::Bulge, 0.5)).unwrap_err();
        assert!(matches!(err, EffectError::EngineUnavailable(_)));
    }

    #[test]
    fn failed_update_is_engine_failed() {
        let engine = RecordingEngine { fail_update: true, ..Default::default() };
        let err = apply_effect(Some(&engine), &RgbaImage::new(4, 4), &request(EffectKind::Bulge, 0.5)).unwrap_err();
        assert_eq!(err, EffectError::EngineFailed("device lost".to_string()));
    }

    #[test]
    fn wrongly_sized_result_is_engine_failed() {
        let engine = RecordingEngine { shrink_output: true, ..Default::default() };
        let err = apply_effect(Some(&engine), &RgbaImage::new(40, 30), &request(EffectKind::Bulge, 0.5)).unwrap_err();
        match err {
            EffectError::EngineFailed(msg) => assert!(msg.contains("20x30"), "{}", msg),
            other => panic!("expected EngineFailed, got {:?}", other),
        }
    }

    #[test]
    fn radius_units_resolve_explicitly() {
        assert_eq!(EffectRadius::Fraction(0.5).resolve(400, 300), 150.0);
        assert_eq!(EffectRadius::Pixels(42.0).resolve(400, 300), 42.0);
        assert_eq!(EffectRadius::Fraction(-1.0).resolve(400, 300), 0.0);
    }

    #[test]
    fn parameters_clamp_into_slider_ranges() {
        let mut p = EffectParameters::new(EffectKind::Pinch, 3.0, -2.0);
        assert_eq!(p.strength(), 1.0);
        assert_eq!(p.radius(), 0.0);
        p.set_strength(f32::NAN);
        assert_eq!(p.strength(), 0.0);
        p.set_radius(0.75);
        assert_eq!(p.effect_radius(), EffectRadius::Fraction(0.75));
    }

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!(EffectKind::parse(" Pinch "), Some(EffectKind::Pinch));
        assert_eq!(EffectKind::parse("swirl"), None);
        assert_eq!(EffectKind::Pinch.signed_strength(0.4), -0.4);
    }
}
