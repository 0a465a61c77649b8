// ============================================================================
// WGSL SHADERS
// ============================================================================

/// Bulge/pinch inverse warp.
///
/// Each thread computes where its output pixel samples from, then fetches
/// that position bilinearly with edge clamping. Must stay in step with
/// `engine::cpu::warp_source`.
pub const BULGE_PINCH_SHADER: &str = r#"
struct WarpParams {
    center:   vec2<f32>,
    radius:   f32,
    strength: f32,
    width:    u32,
    height:   u32,
    _pad0:    u32,
    _pad1:    u32,
};

@group(0) @binding(0) var source_tex: texture_2d<f32>;
@group(0) @binding(1) var output_tex: texture_storage_2d<rgba8unorm, write>;
@group(0) @binding(2) var<uniform> params: WarpParams;

fn load_clamped(x: i32, y: i32) -> vec4<f32> {
    let cx = clamp(x, 0, i32(params.width) - 1);
    let cy = clamp(y, 0, i32(params.height) - 1);
    return textureLoad(source_tex, vec2<i32>(cx, cy), 0);
}

fn sample_bilinear(p: vec2<f32>) -> vec4<f32> {
    let x0 = i32(floor(p.x));
    let y0 = i32(floor(p.y));
    let f = p - floor(p);
    let top = mix(load_clamped(x0, y0),     load_clamped(x0 + 1, y0),     f.x);
    let bot = mix(load_clamped(x0, y0 + 1), load_clamped(x0 + 1, y0 + 1), f.x);
    return mix(top, bot, f.y);
}

@compute @workgroup_size(16, 16)
fn cs_bulge_pinch(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= params.width || gid.y >= params.height) { return; }

    let pixel = vec2<f32>(f32(gid.x) + 0.5, f32(gid.y) + 0.5);
    var coord = pixel - params.center;
    let dist = length(coord);

    if (dist >= params.radius || dist <= 1.0e-6) {
        textureStore(output_tex, vec2<u32>(gid.x, gid.y), load_clamped(i32(gid.x), i32(gid.y)));
        return;
    }

    let percent = dist / params.radius;
    if (params.strength > 0.0) {
        coord = coord * mix(1.0, smoothstep(0.0, params.radius / dist, percent), params.strength * 0.75);
    } else {
        coord = coord * mix(1.0, pow(percent, 1.0 + params.strength * 0.75) * params.radius / dist, 1.0 - percent);
    }

    let src = coord + params.center - vec2<f32>(0.5, 0.5);
    textureStore(output_tex, vec2<u32>(gid.x, gid.y), sample_bilinear(src));
}
"#;
