// ============================================================================
// GPU CONTEXT - wgpu Device, Queue, and adapter initialization
// ============================================================================

use std::sync::Arc;

/// Core wgpu resources for the GPU warp engine.
/// If creation fails the editor falls back to the CPU engine (or reports the
/// engine as unavailable when the GPU was requested explicitly).
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub adapter_name: String,
    /// Maximum texture dimension supported by this device.
    pub max_texture_dim: u32,
    /// Largest buffer the device accepts; bounds the readback staging buffer.
    pub max_buffer_size: u64,
}

impl GpuContext {
    /// Try a hardware adapter first, then the software rasterizer
    /// (`force_fallback_adapter`).
    pub fn new(preferred_gpu: &str) -> Option<Self> {
        if let Some(ctx) = pollster::block_on(Self::new_async(preferred_gpu, false)) {
            return Some(ctx);
        }
        crate::log_warn!("[GPU] Hardware adapter unavailable - trying software fallback");
        pollster::block_on(Self::new_async(preferred_gpu, true))
    }

    async fn new_async(preferred_gpu: &str, force_fallback: bool) -> Option<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: power_preference(preferred_gpu),
                compatible_surface: None, // headless - compute + readback only
                force_fallback_adapter: force_fallback,
            })
            .await?;

        let adapter_name = adapter.get_info().name.clone();
        let limits = adapter.limits();

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("WarpFE GPU"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits {
                        max_texture_dimension_2d: limits.max_texture_dimension_2d,
                        ..wgpu::Limits::downlevel_defaults()
                    },
                },
                None,
            )
            .await
            .ok()?;

        let granted = device.limits();
        crate::log_info!(
            "[GPU] Using adapter '{}' (max texture {}, max buffer {} bytes)",
            adapter_name,
            granted.max_texture_dimension_2d,
            granted.max_buffer_size
        );

        Some(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_name,
            max_texture_dim: granted.max_texture_dimension_2d,
            max_buffer_size: granted.max_buffer_size,
        })
    }

    /// Check if an image of the given dimensions can be uploaded, warped and read back.
    pub fn supports_size(&self, width: u32, height: u32) -> bool {
        fits_limits(width, height, self.max_texture_dim, self.max_buffer_size)
    }

    /// Run `f` inside validation and out-of-memory error scopes, turning any
    /// captured wgpu error into `Err` instead of the default panicking handler.
    pub fn guarded<T>(&self, label: &str, f: impl FnOnce() -> T) -> Result<T, String> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f();
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        match validation.or(out_of_memory) {
            Some(e) => {
                crate::log_err!("[GPU] {} failed: {}", label, e);
                Err(format!("{} failed: {}", label, e))
            }
            None => Ok(value),
        }
    }
}

/// Texture dimension and readback buffer size limits for a `width`×`height` RGBA image.
pub(crate) fn fits_limits(width: u32, height: u32, max_texture_dim: u32, max_buffer_size: u64) -> bool {
    if width == 0 || height == 0 || width > max_texture_dim || height > max_texture_dim {
        return false;
    }
    let staging = super::warp::aligned_bytes_per_row(width) as u64 * height as u64;
    staging <= max_buffer_size
}

/// Map the settings string to a wgpu power preference.
pub(crate) fn power_preference(preferred_gpu: &str) -> wgpu::PowerPreference {
    match preferred_gpu.to_lowercase().as_str() {
        "low power" | "integrated" => wgpu::PowerPreference::LowPower,
        _ => wgpu::PowerPreference::HighPerformance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_string_selects_power_preference() {
        assert_eq!(power_preference("Integrated"), wgpu::PowerPreference::LowPower);
        assert_eq!(power_preference("low power"), wgpu::PowerPreference::LowPower);
        assert_eq!(power_preference("Auto"), wgpu::PowerPreference::HighPerformance);
    }

    const DOWNLEVEL_BUFFER: u64 = 256 << 20;

    #[test]
    fn readback_larger_than_max_buffer_is_rejected() {
        // Within the texture limit, but the padded readback is ~275 MiB.
        assert!(!fits_limits(9000, 8000, 16384, DOWNLEVEL_BUFFER));
        assert!(fits_limits(4000, 3000, 16384, DOWNLEVEL_BUFFER));
    }

    #[test]
    fn texture_dimension_limit_still_applies() {
        assert!(!fits_limits(16385, 10, 16384, u64::MAX));
        assert!(!fits_limits(0, 10, 16384, u64::MAX));
        assert!(fits_limits(16384, 1, 16384, u64::MAX));
    }
}
