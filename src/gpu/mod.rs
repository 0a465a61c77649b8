// ============================================================================
// GPU MODULE - hardware-accelerated warp engine
// ============================================================================
//
// Architecture:
//   context.rs - wgpu Device, Queue, adapter init
//   shaders.rs - WGSL shader source (inline strings)
//   warp.rs    - compute pipeline + EffectEngine implementation
// ============================================================================

pub mod context;
pub mod shaders;
pub mod warp;

pub use warp::GpuEngine;
