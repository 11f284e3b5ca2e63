//! MToon between 0.x Unity material properties and `VRMC_materials_mtoon`.
//!
//! 0.x shades between two thresholds `[shift, lerp(1, shift, toony)]`; 1.0
//! stores the midpoint and width of the same ramp instead.

use std::collections::BTreeMap;

use crate::document::{AlphaMode, Material, TextureInfo};
use crate::vrm::mtoon::{MToon, OutlineWidthMode};
use crate::vrm::vrm0::{SHADER_GLTF, SHADER_MTOON, Vrm0MaterialProperties};

const RENDER_QUEUE_TRANSPARENT: i64 = 3000;
const RENDER_QUEUE_TRANSPARENT_Z_WRITE: i64 = 2501;
const RENDER_QUEUE_CUTOUT: i64 = 2450;
const RENDER_QUEUE_OPAQUE: i64 = 2000;

/// 0.x outline widths are in centimetres.
const OUTLINE_WIDTH_SCALE: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlendMode {
    Opaque,
    Cutout,
    Transparent,
    TransparentWithZWrite,
}

impl BlendMode {
    fn from_float(value: f32) -> Self {
        match value as i32 {
            1 => BlendMode::Cutout,
            2 => BlendMode::Transparent,
            3 => BlendMode::TransparentWithZWrite,
            _ => BlendMode::Opaque,
        }
    }

    fn as_float(self) -> f32 {
        match self {
            BlendMode::Opaque => 0.0,
            BlendMode::Cutout => 1.0,
            BlendMode::Transparent => 2.0,
            BlendMode::TransparentWithZWrite => 3.0,
        }
    }
}

/// `(shadingToony, shadingShift)` in 1.0 terms.
pub(super) fn shading_from_vrm0(shade_shift: f32, shade_toony: f32) -> (f32, f32) {
    let low = shade_shift;
    let high = 1.0 + (shade_shift - 1.0) * shade_toony;
    ((2.0 - (high - low)) / 2.0, -(high + low) / 2.0)
}

/// `(_ShadeShift, _ShadeToony)` in 0.x terms.
pub(super) fn shading_to_vrm0(toony: f32, shift: f32) -> (f32, f32) {
    let low = -shift - (1.0 - toony);
    let high = -shift + (1.0 - toony);
    let span = 1.0 - low;
    let shade_toony = if span.abs() < f32::EPSILON {
        1.0
    } else {
        (1.0 - high) / span
    };
    (low, shade_toony)
}

fn texture(props: &Vrm0MaterialProperties, key: &str) -> Option<TextureInfo> {
    props.texture_properties.get(key).map(|&index| TextureInfo {
        index,
        ..Default::default()
    })
}

fn rgb(values: [f32; 4]) -> [f32; 3] {
    [values[0], values[1], values[2]]
}

fn rgba(values: [f32; 3]) -> Vec<f32> {
    vec![values[0], values[1], values[2], 1.0]
}

pub(super) fn mtoon_from_vrm0(props: &Vrm0MaterialProperties) -> MToon {
    let (toony, shift) = shading_from_vrm0(
        props.float("_ShadeShift", 0.0),
        props.float("_ShadeToony", 0.9),
    );
    let blend = BlendMode::from_float(props.float("_BlendMode", 0.0));
    let render_queue_offset_number = match blend {
        BlendMode::Transparent => props.render_queue - RENDER_QUEUE_TRANSPARENT,
        BlendMode::TransparentWithZWrite => props.render_queue - RENDER_QUEUE_TRANSPARENT_Z_WRITE,
        _ => 0,
    }
    .clamp(-9, 9) as i32;

    MToon {
        transparent_with_z_write: blend == BlendMode::TransparentWithZWrite,
        render_queue_offset_number,
        shade_color_factor: rgb(props.vector("_ShadeColor", [0.97, 0.81, 0.86, 1.0])),
        shade_multiply_texture: texture(props, "_ShadeTexture"),
        shading_shift_factor: shift,
        shading_toony_factor: toony,
        gi_equalization_factor: 1.0 - props.float("_IndirectLightIntensity", 0.1),
        matcap_texture: texture(props, "_SphereAdd"),
        parametric_rim_color_factor: rgb(props.vector("_RimColor", [0.0, 0.0, 0.0, 1.0])),
        rim_multiply_texture: texture(props, "_RimTexture"),
        rim_lighting_mix_factor: props.float("_RimLightingMix", 0.0),
        parametric_rim_fresnel_power_factor: props.float("_RimFresnelPower", 1.0),
        parametric_rim_lift_factor: props.float("_RimLift", 0.0),
        outline_width_mode: match props.float("_OutlineWidthMode", 0.0) as i32 {
            1 => OutlineWidthMode::WorldCoordinates,
            2 => OutlineWidthMode::ScreenCoordinates,
            _ => OutlineWidthMode::None,
        },
        outline_width_factor: props.float("_OutlineWidth", 0.5) * OUTLINE_WIDTH_SCALE,
        outline_width_multiply_texture: texture(props, "_OutlineWidthTexture"),
        outline_color_factor: rgb(props.vector("_OutlineColor", [0.0, 0.0, 0.0, 1.0])),
        outline_lighting_mix_factor: props.float("_OutlineLightingMix", 1.0),
        uv_animation_mask_texture: texture(props, "_UvAnimMaskTexture"),
        uv_animation_scroll_x_speed_factor: props.float("_UvAnimScrollX", 0.0),
        uv_animation_scroll_y_speed_factor: -props.float("_UvAnimScrollY", 0.0),
        uv_animation_rotation_speed_factor: props.float("_UvAnimRotation", 0.0),
        ..Default::default()
    }
}

fn blend_mode(material: &Material, mtoon: &MToon) -> BlendMode {
    match material.alpha_mode {
        AlphaMode::Opaque => BlendMode::Opaque,
        AlphaMode::Mask => BlendMode::Cutout,
        AlphaMode::Blend if mtoon.transparent_with_z_write => BlendMode::TransparentWithZWrite,
        AlphaMode::Blend => BlendMode::Transparent,
    }
}

fn render_queue(blend: BlendMode, offset: i32) -> i64 {
    match blend {
        BlendMode::Opaque => RENDER_QUEUE_OPAQUE,
        BlendMode::Cutout => RENDER_QUEUE_CUTOUT,
        BlendMode::Transparent => RENDER_QUEUE_TRANSPARENT + i64::from(offset),
        BlendMode::TransparentWithZWrite => RENDER_QUEUE_TRANSPARENT_Z_WRITE + i64::from(offset),
    }
}

/// 0.x property block for `material`, named `name`. Materials without MToon
/// are declared as plain glTF shading.
pub(super) fn properties_to_vrm0(material: &Material, name: &str) -> Vrm0MaterialProperties {
    let Some(mtoon) = &material.mtoon else {
        return Vrm0MaterialProperties {
            name: name.to_string(),
            shader: SHADER_GLTF.to_string(),
            render_queue: -1,
            ..Default::default()
        };
    };

    let blend = blend_mode(material, mtoon);
    let (shade_shift, shade_toony) =
        shading_to_vrm0(mtoon.shading_toony_factor, mtoon.shading_shift_factor);

    let float_properties = BTreeMap::from([
        ("_BlendMode".to_string(), blend.as_float()),
        ("_Cutoff".to_string(), material.alpha_cutoff),
        ("_CullMode".to_string(), if material.double_sided { 0.0 } else { 2.0 }),
        ("_ShadeShift".to_string(), shade_shift),
        ("_ShadeToony".to_string(), shade_toony),
        ("_IndirectLightIntensity".to_string(), 1.0 - mtoon.gi_equalization_factor),
        ("_RimLightingMix".to_string(), mtoon.rim_lighting_mix_factor),
        ("_RimFresnelPower".to_string(), mtoon.parametric_rim_fresnel_power_factor),
        ("_RimLift".to_string(), mtoon.parametric_rim_lift_factor),
        (
            "_OutlineWidthMode".to_string(),
            match mtoon.outline_width_mode {
                OutlineWidthMode::None => 0.0,
                OutlineWidthMode::WorldCoordinates => 1.0,
                OutlineWidthMode::ScreenCoordinates => 2.0,
            },
        ),
        ("_OutlineWidth".to_string(), mtoon.outline_width_factor / OUTLINE_WIDTH_SCALE),
        ("_OutlineLightingMix".to_string(), mtoon.outline_lighting_mix_factor),
        ("_UvAnimScrollX".to_string(), mtoon.uv_animation_scroll_x_speed_factor),
        ("_UvAnimScrollY".to_string(), -mtoon.uv_animation_scroll_y_speed_factor),
        ("_UvAnimRotation".to_string(), mtoon.uv_animation_rotation_speed_factor),
    ]);

    let vector_properties = BTreeMap::from([
        ("_Color".to_string(), material.pbr.base_color_factor.to_vec()),
        ("_ShadeColor".to_string(), rgba(mtoon.shade_color_factor)),
        ("_EmissionColor".to_string(), rgba(material.emissive_factor)),
        ("_RimColor".to_string(), rgba(mtoon.parametric_rim_color_factor)),
        ("_OutlineColor".to_string(), rgba(mtoon.outline_color_factor)),
    ]);

    let mut texture_properties = BTreeMap::new();
    let slots = [
        ("_MainTex", &material.pbr.base_color_texture),
        ("_EmissionMap", &material.emissive_texture),
        ("_ShadeTexture", &mtoon.shade_multiply_texture),
        ("_SphereAdd", &mtoon.matcap_texture),
        ("_RimTexture", &mtoon.rim_multiply_texture),
        ("_OutlineWidthTexture", &mtoon.outline_width_multiply_texture),
        ("_UvAnimMaskTexture", &mtoon.uv_animation_mask_texture),
    ];
    for (key, info) in slots {
        if let Some(info) = info {
            texture_properties.insert(key.to_string(), info.index);
        }
    }
    if let Some(normal) = &material.normal_texture {
        texture_properties.insert("_BumpMap".to_string(), normal.info.index);
    }

    let render_type = match blend {
        BlendMode::Opaque => "Opaque",
        BlendMode::Cutout => "TransparentCutout",
        _ => "Transparent",
    };

    Vrm0MaterialProperties {
        name: name.to_string(),
        shader: SHADER_MTOON.to_string(),
        render_queue: render_queue(blend, mtoon.render_queue_offset_number),
        float_properties,
        vector_properties,
        texture_properties,
        keyword_map: BTreeMap::from([(
            "_NORMALMAP".to_string(),
            material.normal_texture.is_some(),
        )]),
        tag_map: BTreeMap::from([("RenderType".to_string(), render_type.to_string())]),
    }
}

pub(super) fn is_mtoon(props: &Vrm0MaterialProperties) -> bool {
    props.shader == SHADER_MTOON
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn given_unity_default_shading_when_migrating_then_toony_and_shift_match_vrm1_defaults() {
        let (toony, shift) = shading_from_vrm0(0.0, 0.9);
        assert!(close(toony, 0.95));
        assert!(close(shift, -0.05));

        let (shade_shift, shade_toony) = shading_to_vrm0(toony, shift);
        assert!(close(shade_shift, 0.0));
        assert!(close(shade_toony, 0.9));
    }

    #[test]
    fn given_transparent_properties_when_migrating_then_queue_offset_and_units_convert() {
        let props = Vrm0MaterialProperties {
            name: "hair".to_string(),
            shader: SHADER_MTOON.to_string(),
            render_queue: 2503,
            float_properties: BTreeMap::from([
                ("_BlendMode".to_string(), 3.0),
                ("_OutlineWidth".to_string(), 0.2),
                ("_UvAnimScrollY".to_string(), 0.5),
                ("_IndirectLightIntensity".to_string(), 0.25),
            ]),
            texture_properties: BTreeMap::from([("_ShadeTexture".to_string(), 2)]),
            ..Default::default()
        };

        let mtoon = mtoon_from_vrm0(&props);

        assert!(mtoon.transparent_with_z_write);
        assert_eq!(mtoon.render_queue_offset_number, 2);
        assert!(close(mtoon.outline_width_factor, 0.002));
        assert_eq!(mtoon.uv_animation_scroll_y_speed_factor, -0.5);
        assert_eq!(mtoon.gi_equalization_factor, 0.75);
        assert_eq!(mtoon.shade_multiply_texture.map(|info| info.index), Some(2));
    }

    #[test]
    fn given_blend_material_when_exporting_then_render_queue_includes_offset() {
        let material = Material {
            alpha_mode: AlphaMode::Blend,
            mtoon: Some(MToon {
                render_queue_offset_number: -3,
                ..Default::default()
            }),
            ..Default::default()
        };

        let props = properties_to_vrm0(&material, "skin");

        assert_eq!(props.shader, SHADER_MTOON);
        assert_eq!(props.render_queue, 2997);
        assert_eq!(props.float("_BlendMode", -1.0), 2.0);
        assert_eq!(props.tag_map.get("RenderType").map(String::as_str), Some("Transparent"));
        assert!(!is_mtoon(&properties_to_vrm0(&Material::default(), "plain")));
    }
}
