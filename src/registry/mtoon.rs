//! `VRMC_materials_mtoon`: per-material toon shading parameters (1.0).

use serde_json::{Map, Value, json};

use crate::decode::reader::ObjectReader;
use crate::decode::{decode_texture_info, optional_texture_info};
use crate::document::{Document, SpecGeneration, TextureInfo};
use crate::encode::remap::RemapTables;
use crate::error::{Result, VrmError};
use crate::validate::{IssueKind, IssueReport, NodeGraph};
use crate::vrm::mtoon::{MToon, OutlineWidthMode};

use super::{
    ExtensionSchema, SchemaScope, SchemaTarget, float_value, floats_value, texture_info_value,
};

const NAME: &str = "VRMC_materials_mtoon";

pub struct MToonSchema;

const TEXTURE_KEYS: [&str; 6] = [
    "shadeMultiplyTexture",
    "shadingShiftTexture",
    "matcapTexture",
    "rimMultiplyTexture",
    "outlineWidthMultiplyTexture",
    "uvAnimationMaskTexture",
];

fn decode_mtoon(reader: ObjectReader<'_>) -> Result<MToon> {
    let defaults = MToon::default();

    let (shading_shift_texture, shading_shift_texture_scale) =
        match reader.object("shadingShiftTexture")? {
            Some(child) => {
                let texture = child.reader();
                (
                    Some(decode_texture_info(texture)?),
                    texture.f32_or("scale", defaults.shading_shift_texture_scale)?,
                )
            }
            None => (None, defaults.shading_shift_texture_scale),
        };

    let render_queue_offset_number = reader.i64_or(
        "renderQueueOffsetNumber",
        i64::from(defaults.render_queue_offset_number),
    )?;
    let render_queue_offset_number = i32::try_from(render_queue_offset_number).map_err(|_| {
        VrmError::schema(
            reader.child_pointer("renderQueueOffsetNumber"),
            "32-bit integer",
            render_queue_offset_number.to_string(),
        )
    })?;

    Ok(MToon {
        spec_version: reader.string_or("specVersion", &defaults.spec_version)?,
        transparent_with_z_write: reader.bool_or("transparentWithZWrite", false)?,
        render_queue_offset_number,
        shade_color_factor: reader.float_array("shadeColorFactor", defaults.shade_color_factor)?,
        shade_multiply_texture: optional_texture_info(reader, "shadeMultiplyTexture")?,
        shading_shift_factor: reader.f32_or("shadingShiftFactor", defaults.shading_shift_factor)?,
        shading_shift_texture,
        shading_shift_texture_scale,
        shading_toony_factor: reader.f32_or("shadingToonyFactor", defaults.shading_toony_factor)?,
        gi_equalization_factor: reader
            .f32_or("giEqualizationFactor", defaults.gi_equalization_factor)?,
        matcap_factor: reader.float_array("matcapFactor", defaults.matcap_factor)?,
        matcap_texture: optional_texture_info(reader, "matcapTexture")?,
        parametric_rim_color_factor: reader
            .float_array("parametricRimColorFactor", defaults.parametric_rim_color_factor)?,
        rim_multiply_texture: optional_texture_info(reader, "rimMultiplyTexture")?,
        rim_lighting_mix_factor: reader
            .f32_or("rimLightingMixFactor", defaults.rim_lighting_mix_factor)?,
        parametric_rim_fresnel_power_factor: reader.f32_or(
            "parametricRimFresnelPowerFactor",
            defaults.parametric_rim_fresnel_power_factor,
        )?,
        parametric_rim_lift_factor: reader
            .f32_or("parametricRimLiftFactor", defaults.parametric_rim_lift_factor)?,
        outline_width_mode: reader.enumeration(
            "outlineWidthMode",
            OutlineWidthMode::None,
            OutlineWidthMode::parse,
        )?,
        outline_width_factor: reader.f32_or("outlineWidthFactor", defaults.outline_width_factor)?,
        outline_width_multiply_texture: optional_texture_info(
            reader,
            "outlineWidthMultiplyTexture",
        )?,
        outline_color_factor: reader
            .float_array("outlineColorFactor", defaults.outline_color_factor)?,
        outline_lighting_mix_factor: reader
            .f32_or("outlineLightingMixFactor", defaults.outline_lighting_mix_factor)?,
        uv_animation_mask_texture: optional_texture_info(reader, "uvAnimationMaskTexture")?,
        uv_animation_scroll_x_speed_factor: reader.f32_or(
            "uvAnimationScrollXSpeedFactor",
            defaults.uv_animation_scroll_x_speed_factor,
        )?,
        uv_animation_scroll_y_speed_factor: reader.f32_or(
            "uvAnimationScrollYSpeedFactor",
            defaults.uv_animation_scroll_y_speed_factor,
        )?,
        uv_animation_rotation_speed_factor: reader.f32_or(
            "uvAnimationRotationSpeedFactor",
            defaults.uv_animation_rotation_speed_factor,
        )?,
    })
}

/// Factors are written clamped into their declared ranges.
fn encode_mtoon(mtoon: &MToon) -> Value {
    let mtoon = mtoon.clamped();
    let mut object = Map::new();
    let mut put = |key: &str, value: Value| {
        object.insert(key.to_string(), value);
    };

    put("specVersion", json!(mtoon.spec_version));
    put("transparentWithZWrite", json!(mtoon.transparent_with_z_write));
    put("renderQueueOffsetNumber", json!(mtoon.render_queue_offset_number));
    put("shadeColorFactor", floats_value(&mtoon.shade_color_factor));
    put("shadingShiftFactor", float_value(mtoon.shading_shift_factor));
    put("shadingToonyFactor", float_value(mtoon.shading_toony_factor));
    put("giEqualizationFactor", float_value(mtoon.gi_equalization_factor));
    put("matcapFactor", floats_value(&mtoon.matcap_factor));
    put("parametricRimColorFactor", floats_value(&mtoon.parametric_rim_color_factor));
    put("rimLightingMixFactor", float_value(mtoon.rim_lighting_mix_factor));
    put(
        "parametricRimFresnelPowerFactor",
        float_value(mtoon.parametric_rim_fresnel_power_factor),
    );
    put("parametricRimLiftFactor", float_value(mtoon.parametric_rim_lift_factor));
    put("outlineWidthMode", json!(mtoon.outline_width_mode.as_str()));
    put("outlineWidthFactor", float_value(mtoon.outline_width_factor));
    put("outlineColorFactor", floats_value(&mtoon.outline_color_factor));
    put("outlineLightingMixFactor", float_value(mtoon.outline_lighting_mix_factor));
    put(
        "uvAnimationScrollXSpeedFactor",
        float_value(mtoon.uv_animation_scroll_x_speed_factor),
    );
    put(
        "uvAnimationScrollYSpeedFactor",
        float_value(mtoon.uv_animation_scroll_y_speed_factor),
    );
    put(
        "uvAnimationRotationSpeedFactor",
        float_value(mtoon.uv_animation_rotation_speed_factor),
    );

    let textures: [(&str, &Option<TextureInfo>); 6] = [
        (TEXTURE_KEYS[0], &mtoon.shade_multiply_texture),
        (TEXTURE_KEYS[1], &mtoon.shading_shift_texture),
        (TEXTURE_KEYS[2], &mtoon.matcap_texture),
        (TEXTURE_KEYS[3], &mtoon.rim_multiply_texture),
        (TEXTURE_KEYS[4], &mtoon.outline_width_multiply_texture),
        (TEXTURE_KEYS[5], &mtoon.uv_animation_mask_texture),
    ];
    for (key, info) in textures {
        let Some(info) = info else {
            continue;
        };
        let mut value = texture_info_value(info);
        if key == "shadingShiftTexture" {
            if let Some(object) = value.as_object_mut() {
                object.insert("scale".into(), float_value(mtoon.shading_shift_texture_scale));
            }
        }
        put(key, value);
    }
    Value::Object(object)
}

impl ExtensionSchema for MToonSchema {
    fn generation(&self) -> SpecGeneration {
        SpecGeneration::Vrm1
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn scope(&self) -> SchemaScope {
        SchemaScope::Material
    }

    fn decode(
        &self,
        reader: ObjectReader<'_>,
        target: SchemaTarget,
        document: &mut Document,
    ) -> Result<()> {
        let SchemaTarget::Material(index) = target else {
            return Err(VrmError::schema(reader.pointer(), "material extension", "other scope"));
        };
        let mtoon = decode_mtoon(reader)?;
        match document.materials.get_mut(index) {
            Some(material) => {
                material.mtoon = Some(mtoon);
                Ok(())
            }
            None => Err(VrmError::schema(
                reader.pointer(),
                "existing material",
                "missing material",
            )),
        }
    }

    fn encode(&self, document: &Document, target: SchemaTarget) -> Result<Option<Value>> {
        let SchemaTarget::Material(index) = target else {
            return Ok(None);
        };
        Ok(document
            .materials
            .get(index)
            .and_then(|material| material.mtoon.as_ref())
            .map(encode_mtoon))
    }

    fn validate(&self, document: &Document, _graph: &NodeGraph, report: &mut IssueReport) {
        for (index, material) in document.materials.iter().enumerate() {
            let Some(mtoon) = &material.mtoon else {
                continue;
            };
            let pointer = format!("/materials/{index}/extensions/{NAME}");
            for violation in mtoon.range_violations() {
                report.push(
                    IssueKind::MtoonValueOutOfRange,
                    format!("{pointer}/{}", violation.field),
                    format!(
                        "{} = {} is outside [{}, {}]; it will be clamped on export",
                        violation.field, violation.value, violation.min, violation.max
                    ),
                );
            }
            let textures = [
                &mtoon.shade_multiply_texture,
                &mtoon.shading_shift_texture,
                &mtoon.matcap_texture,
                &mtoon.rim_multiply_texture,
                &mtoon.outline_width_multiply_texture,
                &mtoon.uv_animation_mask_texture,
            ];
            for (key, info) in TEXTURE_KEYS.iter().zip(textures) {
                if let Some(info) = info {
                    report.check_index(
                        format!("{pointer}/{key}/index"),
                        info.index,
                        document.textures.len(),
                        "texture",
                    );
                }
            }
        }
    }

    /// Texture indices inside MToon are rewritten with the material itself.
    fn remap(&self, _document: &mut Document, _tables: &RemapTables) -> Result<()> {
        Ok(())
    }
}
