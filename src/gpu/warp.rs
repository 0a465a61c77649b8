// ============================================================================
// GPU WARP ENGINE - compute-shader bulge/pinch with texture readback
// ============================================================================

use bytemuck::{Pod, Zeroable};
use image::RgbaImage;
use wgpu::util::DeviceExt;

use super::context::GpuContext;
use crate::engine::{EffectEngine, TextureHandle, WarpCanvas};

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct WarpParams {
    center: [f32; 2],
    radius: f32,
    strength: f32,
    width: u32,
    height: u32,
    _pad0: u32,
    _pad1: u32,
}

fn texture_extent(w: u32, h: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: w,
        height: h,
        depth_or_array_layers: 1,
    }
}

fn upload_rgba(ctx: &GpuContext, image: &RgbaImage, label: &str) -> wgpu::Texture {
    let (w, h) = image.dimensions();
    let tex = ctx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: texture_extent(w, h),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    ctx.queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &tex,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        image.as_raw(),
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * w),
            rows_per_image: Some(h),
        },
        texture_extent(w, h),
    );
    tex
}

fn create_rw_texture(ctx: &GpuContext, w: u32, h: u32, label: &str) -> wgpu::Texture {
    ctx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: texture_extent(w, h),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::STORAGE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    })
}

/// `bytes_per_row` for texture → buffer copies must be a multiple of 256.
pub(crate) fn aligned_bytes_per_row(width: u32) -> u32 {
    let unaligned = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unaligned.div_ceil(align) * align
}

/// Copy a texture back to packed RGBA bytes.
fn readback_texture(ctx: &GpuContext, texture: &wgpu::Texture, width: u32, height: u32) -> Result<Vec<u8>, String> {
    let bytes_per_row = aligned_bytes_per_row(width);
    let staging = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("warp_readback_staging"),
        size: bytes_per_row as u64 * height as u64,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("warp_readback_encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &staging,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        texture_extent(width, height),
    );
    ctx.queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    ctx.device.poll(wgpu::Maintain::Wait);
    match rx.recv() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(format!("readback map error: {:?}", e)),
        Err(e) => return Err(format!("readback channel error: {:?}", e)),
    }

    let mapped = slice.get_mapped_range();
    let actual_row = (width * 4) as usize;
    let mut result = Vec::with_capacity(actual_row * height as usize);
    for y in 0..height as usize {
        let start = y * bytes_per_row as usize;
        result.extend_from_slice(&mapped[start..start + actual_row]);
    }
    drop(mapped);
    staging.unmap();
    Ok(result)
}

/// Warp engine backed by a wgpu compute pipeline.
pub struct GpuEngine {
    ctx: GpuContext,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl GpuEngine {
    /// `None` if no adapter (hardware or fallback) could be initialized.
    pub fn new(preferred_gpu: &str) -> Option<Self> {
        let ctx = GpuContext::new(preferred_gpu)?;
        let device = &ctx.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("bulge_pinch_shader"),
            source: wgpu::ShaderSource::Wgsl(super::shaders::BULGE_PINCH_SHADER.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("bulge_pinch_bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: wgpu::TextureFormat::Rgba8Unorm,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("bulge_pinch_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("bulge_pinch_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "cs_bulge_pinch",
            compilation_options: Default::default(),
        });

        Some(Self {
            ctx,
            pipeline,
            bind_group_layout,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.ctx.adapter_name
    }

    fn dispatch(&self, src: &wgpu::Texture, w: u32, h: u32, params: WarpParams) -> wgpu::Texture {
        let device = &self.ctx.device;
        let dst = create_rw_texture(&self.ctx, w, h, "warp_dst");

        let params_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("warp_params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let src_view = src.create_view(&wgpu::TextureViewDescriptor::default());
        let dst_view = dst.create_view(&wgpu::TextureViewDescriptor::default());

        let bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("warp_bg"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&src_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&dst_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params_buf.as_entire_binding(),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("warp_encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("warp_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bg, &[]);
            pass.dispatch_workgroups(w.div_ceil(16), h.div_ceil(16), 1);
        }
        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        dst
    }
}

impl EffectEngine for GpuEngine {
    fn name(&self) -> &str {
        "gpu"
    }

    fn adapter(&self) -> Option<&str> {
        Some(self.adapter_name())
    }

    fn create_canvas(&self) -> Result<Box<dyn WarpCanvas + '_>, String> {
        Ok(Box::new(GpuCanvas {
            engine: self,
            textures: Vec::new(),
            current: None,
            width: 0,
            height: 0,
            output: None,
            failure: None,
        }))
    }
}

struct GpuCanvas<'a> {
    engine: &'a GpuEngine,
    textures: Vec<(wgpu::Texture, u32, u32)>,
    current: Option<wgpu::Texture>,
    width: u32,
    height: u32,
    output: Option<RgbaImage>,
    /// First GPU error captured by `bulge_pinch`, reported by `update`.
    failure: Option<String>,
}

impl WarpCanvas for GpuCanvas<'_> {
    fn upload_texture(&mut self, image: &RgbaImage) -> Result<TextureHandle, String> {
        let (w, h) = image.dimensions();
        let ctx = &self.engine.ctx;
        if !ctx.supports_size(w, h) {
            return Err(format!(
                "{}x{} exceeds GPU limits (texture {}, buffer {} bytes)",
                w, h, ctx.max_texture_dim, ctx.max_buffer_size
            ));
        }
        let tex = ctx.guarded("texture upload", || upload_rgba(ctx, image, "warp_src"))?;
        self.textures.push((tex, w, h));
        Ok(TextureHandle(self.textures.len() as u32 - 1))
    }

    fn draw(&mut self, texture: TextureHandle) -> Result<(), String> {
        let (tex, w, h) = self
            .textures
            .get(texture.0 as usize)
            .ok_or_else(|| format!("unknown texture {}", texture.0))?;
        let ctx = &self.engine.ctx;
        let copy = ctx.guarded("draw", || {
            let copy = create_rw_texture(ctx, *w, *h, "warp_canvas");
            let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("warp_draw_encoder"),
            });
            encoder.copy_texture_to_texture(tex.as_image_copy(), copy.as_image_copy(), texture_extent(*w, *h));
            ctx.queue.submit(std::iter::once(encoder.finish()));
            copy
        })?;
        self.width = *w;
        self.height = *h;
        self.current = Some(copy);
        self.output = None;
        self.failure = None;
        Ok(())
    }

    fn bulge_pinch(&mut self, center_x: f32, center_y: f32, radius: f32, strength: f32) {
        let Some(src) = self.current.as_ref() else { return };
        let params = WarpParams {
            center: [center_x, center_y],
            radius: radius.max(0.0),
            strength,
            width: self.width,
            height: self.height,
            _pad0: 0,
            _pad1: 0,
        };
        let (w, h) = (self.width, self.height);
        match self.engine.ctx.guarded("warp dispatch", || self.engine.dispatch(src, w, h, params)) {
            Ok(dst) => self.current = Some(dst),
            Err(e) => {
                self.failure.get_or_insert(e);
            }
        }
        self.output = None;
    }

    fn update(&mut self) -> Result<(), String> {
        if let Some(e) = &self.failure {
            return Err(e.clone());
        }
        let tex = self.current.as_ref().ok_or_else(|| "nothing drawn".to_string())?;
        let ctx = &self.engine.ctx;
        let raw = ctx.guarded("readback", || readback_texture(ctx, tex, self.width, self.height))??;
        let img = RgbaImage::from_raw(self.width, self.height, raw)
            .ok_or_else(|| "readback size mismatch".to_string())?;
        self.output = Some(img);
        Ok(())
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn into_image(self: Box<Self>) -> RgbaImage {
        self.output.unwrap_or_else(|| RgbaImage::new(0, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_align_to_copy_alignment() {
        assert_eq!(aligned_bytes_per_row(1), 256);
        assert_eq!(aligned_bytes_per_row(64), 256);
        assert_eq!(aligned_bytes_per_row(65), 512);
    }

    #[test]
    fn uniform_layout_matches_shader_struct() {
        assert_eq!(std::mem::size_of::<WarpParams>(), 32);
    }
}
