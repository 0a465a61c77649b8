// ============================================================================
// EFFECT ENGINE CAPABILITY - what the invoker needs from a warp backend
// ============================================================================
//
// Backends:
//   cpu.rs      - rayon row-parallel inverse warp
//   ../gpu/     - wgpu compute-shader warp
//   fallback.rs - primary engine with per-image CPU retry (the Auto backend)
//
// An engine hands out a canvas; the invoker uploads the source, draws it,
// queues one bulge/pinch, calls update and reads the result back.
// ============================================================================

pub mod cpu;
pub mod fallback;

use image::RgbaImage;

pub use cpu::CpuEngine;
pub use fallback::FallbackEngine;

/// Opaque id of a texture uploaded to a [`WarpCanvas`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureHandle(pub u32);

/// A source of warp canvases.
pub trait EffectEngine {
    fn name(&self) -> &str;

    /// Hardware the engine runs on, when that means anything.
    fn adapter(&self) -> Option<&str> {
        None
    }

    /// Fails when the backend cannot currently render (lost device, etc.).
    fn create_canvas(&self) -> Result<Box<dyn WarpCanvas + '_>, String>;
}

/// A render target holding one working image.
pub trait WarpCanvas {
    fn upload_texture(&mut self, image: &RgbaImage) -> Result<TextureHandle, String>;

    /// Replace the canvas content with `texture`, resizing the canvas to match.
    fn draw(&mut self, texture: TextureHandle) -> Result<(), String>;

    /// Warp the current content around (center_x, center_y). Positive strength
    /// bulges outward, negative pinches inward. Coordinates are native pixels.
    fn bulge_pinch(&mut self, center_x: f32, center_y: f32, radius: f32, strength: f32);

    /// Finish pending work so the content can be read back.
    fn update(&mut self) -> Result<(), String>;

    fn width(&self) -> u32;
    fn height(&self) -> u32;

    fn into_image(self: Box<Self>) -> RgbaImage;
}

/// Which engine the editor asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum EngineBackend {
    /// GPU when an adapter is available, CPU otherwise or when the GPU
    /// refuses an image.
    #[default]
    Auto,
    Cpu,
    Gpu,
    /// No engine at all; every apply reports the engine as unavailable.
    None,
}

impl EngineBackend {
    pub const ALL: [EngineBackend; 4] = [
        EngineBackend::Auto,
        EngineBackend::Cpu,
        EngineBackend::Gpu,
        EngineBackend::None,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineBackend::Auto => "auto",
            EngineBackend::Cpu => "cpu",
            EngineBackend::Gpu => "gpu",
            EngineBackend::None => "none",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EngineBackend::Auto => "Auto",
            EngineBackend::Cpu => "CPU",
            EngineBackend::Gpu => "GPU",
            EngineBackend::None => "Disabled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Some(EngineBackend::Auto),
            "cpu" => Some(EngineBackend::Cpu),
            "gpu" => Some(EngineBackend::Gpu),
            "none" | "off" => Some(EngineBackend::None),
            _ => None,
        }
    }
}

/// Build the engine for `backend`. `None` means the capability is absent.
pub fn create_engine(backend: EngineBackend, preferred_gpu: &str) -> Option<Box<dyn EffectEngine>> {
    match backend {
        EngineBackend::Cpu => Some(Box::new(CpuEngine)),
        EngineBackend::Gpu => match crate::gpu::GpuEngine::new(preferred_gpu) {
            Some(engine) => Some(Box::new(engine)),
            None => {
                crate::log_warn!("GPU engine requested but no adapter could be created");
                None
            }
        },
        EngineBackend::Auto => match crate::gpu::GpuEngine::new(preferred_gpu) {
            Some(engine) => Some(Box::new(FallbackEngine::new(Box::new(engine)))),
            None => {
                crate::log_info!("No GPU adapter, using CPU engine");
                Some(Box::new(CpuEngine))
            }
        },
        EngineBackend::None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names_parse_back() {
        for b in EngineBackend::ALL {
            assert_eq!(EngineBackend::parse(b.as_str()), Some(b));
        }
        assert_eq!(EngineBackend::parse("OFF"), Some(EngineBackend::None));
        assert_eq!(EngineBackend::parse("opengl"), None);
    }

    #[test]
    fn none_backend_has_no_engine() {
        assert!(create_engine(EngineBackend::None, "Auto").is_none());
    }

    #[test]
    fn cpu_backend_is_always_available() {
        let engine = create_engine(EngineBackend::Cpu, "Auto").unwrap();
        assert_eq!(engine.name(), "cpu");
        assert!(engine.create_canvas().is_ok());
    }
}
