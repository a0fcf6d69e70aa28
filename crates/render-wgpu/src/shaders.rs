/// Depth-only shader for the shadow passes.
pub const SHADOW_SHADER: &str = r#"
struct ShadowUniforms {
    light_space: mat4x4<f32>,
};

@group(0) @binding(0)
var<uniform> shadow: ShadowUniforms;

struct InstanceInput {
    @location(3) model_0: vec4<f32>,
    @location(4) model_1: vec4<f32>,
    @location(5) model_2: vec4<f32>,
    @location(6) model_3: vec4<f32>,
};

@vertex
fn vs_shadow(@location(0) position: vec3<f32>, instance: InstanceInput) -> @builtin(position) vec4<f32> {
    let model = mat4x4<f32>(
        instance.model_0,
        instance.model_1,
        instance.model_2,
        instance.model_3,
    );
    return shadow.light_space * model * vec4<f32>(position, 1.0);
}
"#;

/// Forward shader for the main pass: textured Blinn-Phong with up to four
/// lights and two comparison-sampled shadow maps.
///
/// Kept in step with `shadowbox_render::shade`.
pub const SCENE_SHADER: &str = r#"
struct Light {
    // xyz position, w kind (0 directional, 1 spot, 2 point)
    position_kind: vec4<f32>,
    // xyz direction, w shadow slot or -1
    direction_shadow: vec4<f32>,
    color_strength: vec4<f32>,
    // inner and outer cone cosines
    cone: vec4<f32>,
};

struct Frame {
    view_proj: mat4x4<f32>,
    light_space: array<mat4x4<f32>, 2>,
    camera_ambient: vec4<f32>,
    // bias slope, bias floor, light count
    params: vec4<f32>,
    shadow_flags: vec4<f32>,
    lights: array<Light, 4>,
};

@group(0) @binding(0)
var<uniform> frame: Frame;
@group(0) @binding(1)
var shadow_global: texture_depth_2d;
@group(0) @binding(2)
var shadow_flashlight: texture_depth_2d;
@group(0) @binding(3)
var shadow_sampler: sampler_comparison;

@group(1) @binding(0)
var albedo_texture: texture_2d<f32>;
@group(1) @binding(1)
var albedo_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

struct InstanceInput {
    @location(3) model_0: vec4<f32>,
    @location(4) model_1: vec4<f32>,
    @location(5) model_2: vec4<f32>,
    @location(6) model_3: vec4<f32>,
    @location(7) normal_0: vec4<f32>,
    @location(8) normal_1: vec4<f32>,
    @location(9) normal_2: vec4<f32>,
    @location(10) albedo_emissive: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) albedo_emissive: vec4<f32>,
};

@vertex
fn vs_main(vertex: VertexInput, instance: InstanceInput) -> VertexOutput {
    let model = mat4x4<f32>(
        instance.model_0,
        instance.model_1,
        instance.model_2,
        instance.model_3,
    );
    let normal_matrix = mat3x3<f32>(
        instance.normal_0.xyz,
        instance.normal_1.xyz,
        instance.normal_2.xyz,
    );
    let world = model * vec4<f32>(vertex.position, 1.0);

    var out: VertexOutput;
    out.clip_position = frame.view_proj * world;
    out.world_position = world.xyz;
    out.world_normal = normal_matrix * vertex.normal;
    out.uv = vertex.uv;
    out.albedo_emissive = instance.albedo_emissive;
    return out;
}

const SPECULAR_STRENGTH: f32 = 0.5;
const SHININESS: f32 = 32.0;

fn distance_attenuation(d: f32) -> f32 {
    return 1.0 / (1.0 + 0.09 * d + 0.032 * d * d);
}

fn shadow_visibility(slot: u32, world: vec3<f32>, bias: f32) -> f32 {
    let clip = frame.light_space[slot] * vec4<f32>(world, 1.0);
    if clip.w <= 0.0 {
        return 1.0;
    }
    let ndc = clip.xyz / clip.w;
    if abs(ndc.x) > 1.0 || abs(ndc.y) > 1.0 || ndc.z < 0.0 || ndc.z > 1.0 {
        return 1.0;
    }
    let uv = vec2<f32>(ndc.x * 0.5 + 0.5, ndc.y * -0.5 + 0.5);
    let reference = ndc.z - bias;
    if slot == 0u {
        return textureSampleCompareLevel(shadow_global, shadow_sampler, uv, reference);
    }
    return textureSampleCompareLevel(shadow_flashlight, shadow_sampler, uv, reference);
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let texel = textureSample(albedo_texture, albedo_sampler, in.uv).rgb;
    if in.albedo_emissive.w > 0.5 {
        return vec4<f32>(in.albedo_emissive.rgb, 1.0);
    }
    let albedo = texel * in.albedo_emissive.rgb;
    let n = normalize(in.world_normal);
    let v = normalize(frame.camera_ambient.xyz - in.world_position);
    var color = albedo * frame.camera_ambient.w;

    let count = u32(frame.params.z);
    for (var i = 0u; i < count; i = i + 1u) {
        let light = frame.lights[i];
        let strength = light.color_strength.w;
        if strength <= 0.0 {
            continue;
        }

        let kind = light.position_kind.w;
        var l: vec3<f32>;
        var attenuation = 1.0;
        if kind < 0.5 {
            l = -normalize(light.direction_shadow.xyz);
        } else {
            let to_light = light.position_kind.xyz - in.world_position;
            let d = length(to_light);
            l = to_light / max(d, 1e-4);
            attenuation = distance_attenuation(d);
            if kind < 1.5 {
                let theta = dot(l, -normalize(light.direction_shadow.xyz));
                let softness = max(light.cone.x - light.cone.y, 1e-4);
                attenuation = attenuation * clamp((theta - light.cone.y) / softness, 0.0, 1.0);
            }
        }

        let n_dot_l = dot(n, l);
        if n_dot_l <= 0.0 || attenuation <= 0.0 {
            continue;
        }

        var visibility = 1.0;
        let slot = light.direction_shadow.w;
        if slot >= 0.0 {
            let index = u32(slot);
            if frame.shadow_flags[index] > 0.5 {
                let bias = max(frame.params.x * (1.0 - clamp(n_dot_l, 0.0, 1.0)), frame.params.y);
                visibility = shadow_visibility(index, in.world_position, bias);
            }
        }
        if visibility <= 0.0 {
            continue;
        }

        let h = normalize(l + v);
        let specular = pow(max(dot(n, h), 0.0), SHININESS) * SPECULAR_STRENGTH;
        let lit = albedo * n_dot_l + vec3<f32>(specular);
        color = color + light.color_strength.rgb * strength * lit * attenuation * visibility;
    }
    return vec4<f32>(color, 1.0);
}
"#;
