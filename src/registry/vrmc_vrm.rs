//! `VRMC_vrm`: meta, humanoid, first person, look-at and expressions (1.0).

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

use crate::decode::reader::ObjectReader;
use crate::document::{Document, SpecGeneration};
use crate::encode::remap::{ReferenceMarks, RemapTables};
use crate::error::{Result, VrmError};
use crate::validate::humanoid::{BoneAssignment, check_humanoid};
use crate::validate::{IssueKind, IssueReport, NodeGraph};
use crate::vrm::HumanBone;
use crate::vrm::vrm1::{
    Expression, ExpressionOverride, ExpressionPreset, FirstPersonAnnotation, FirstPersonType,
    LookAt, LookAtType, MaterialColorBind, MaterialColorType, Meta, MorphTargetBind, RangeMap,
    TextureTransformBind, Vrm1,
};
use crate::log_warn;

use super::{ExtensionSchema, SchemaScope, SchemaTarget, float_value, floats_value, remap_bone};

const NAME: &str = "VRMC_vrm";
const POINTER: &str = "/extensions/VRMC_vrm";

pub struct VrmcVrmSchema;

// ─── Decode ───────────────────────────────────────────────────────────────────

fn decode_meta(reader: ObjectReader<'_>) -> Result<Meta> {
    let defaults = Meta::default();
    if !reader.contains("authors") {
        return Err(VrmError::schema(reader.child_pointer("authors"), "array", "missing"));
    }
    Ok(Meta {
        name: reader.require_string("name")?,
        version: reader.string("version")?,
        authors: reader.strings("authors")?,
        copyright_information: reader.string("copyrightInformation")?,
        contact_information: reader.string("contactInformation")?,
        references: reader.strings("references")?,
        third_party_licenses: reader.string("thirdPartyLicenses")?,
        thumbnail_image: reader.index("thumbnailImage")?,
        license_url: reader.require_string("licenseUrl")?,
        avatar_permission: reader.string_or("avatarPermission", &defaults.avatar_permission)?,
        allow_excessively_violent_usage: reader.bool_or("allowExcessivelyViolentUsage", false)?,
        allow_excessively_sexual_usage: reader.bool_or("allowExcessivelySexualUsage", false)?,
        commercial_usage: reader.string_or("commercialUsage", &defaults.commercial_usage)?,
        allow_political_or_religious_usage: reader
            .bool_or("allowPoliticalOrReligiousUsage", false)?,
        allow_antisocial_or_hate_usage: reader.bool_or("allowAntisocialOrHateUsage", false)?,
        credit_notation: reader.string_or("creditNotation", &defaults.credit_notation)?,
        allow_redistribution: reader.bool_or("allowRedistribution", false)?,
        modification: reader.string_or("modification", &defaults.modification)?,
        other_license_url: reader.string("otherLicenseUrl")?,
    })
}

fn decode_humanoid(reader: ObjectReader<'_>) -> Result<BTreeMap<HumanBone, usize>> {
    let mut humanoid = BTreeMap::new();
    reader.require_object("humanBones")?;
    for (name, child) in reader.object_entries("humanBones")? {
        let Some(bone) = HumanBone::parse(name) else {
            log_warn!("ignoring unknown human bone '{name}' at {}", child.reader().pointer());
            continue;
        };
        humanoid.insert(bone, child.reader().require_index("node")?);
    }
    Ok(humanoid)
}

fn decode_range_map(reader: ObjectReader<'_>, key: &str) -> Result<RangeMap> {
    let defaults = RangeMap::default();
    let Some(child) = reader.object(key)? else {
        return Ok(defaults);
    };
    let map = child.reader();
    Ok(RangeMap {
        input_max_value: map.f32_or("inputMaxValue", defaults.input_max_value)?,
        output_scale: map.f32_or("outputScale", defaults.output_scale)?,
    })
}

fn decode_look_at(reader: ObjectReader<'_>) -> Result<LookAt> {
    let defaults = LookAt::default();
    Ok(LookAt {
        offset_from_head_bone: reader
            .float_array("offsetFromHeadBone", defaults.offset_from_head_bone)?,
        kind: reader.enumeration("type", LookAtType::Bone, LookAtType::parse)?,
        range_map_horizontal_inner: decode_range_map(reader, "rangeMapHorizontalInner")?,
        range_map_horizontal_outer: decode_range_map(reader, "rangeMapHorizontalOuter")?,
        range_map_vertical_down: decode_range_map(reader, "rangeMapVerticalDown")?,
        range_map_vertical_up: decode_range_map(reader, "rangeMapVerticalUp")?,
    })
}

fn decode_expression(reader: ObjectReader<'_>) -> Result<Expression> {
    let mut expression = Expression {
        is_binary: reader.bool_or("isBinary", false)?,
        override_blink: reader.enumeration(
            "overrideBlink",
            ExpressionOverride::None,
            ExpressionOverride::parse,
        )?,
        override_look_at: reader.enumeration(
            "overrideLookAt",
            ExpressionOverride::None,
            ExpressionOverride::parse,
        )?,
        override_mouth: reader.enumeration(
            "overrideMouth",
            ExpressionOverride::None,
            ExpressionOverride::parse,
        )?,
        ..Default::default()
    };

    for child in reader.objects("morphTargetBinds")? {
        let bind = child.reader();
        expression.morph_target_binds.push(MorphTargetBind {
            node: bind.require_index("node")?,
            index: bind.require_index("index")?,
            weight: bind.require_f32("weight")?,
        });
    }
    for child in reader.objects("materialColorBinds")? {
        let bind = child.reader();
        let kind = bind.require_string("type")?;
        expression.material_color_binds.push(MaterialColorBind {
            material: bind.require_index("material")?,
            kind: MaterialColorType::parse(&kind).ok_or_else(|| {
                VrmError::schema(bind.child_pointer("type"), "material color type", kind.clone())
            })?,
            target_value: bind.float_array("targetValue", [0.0; 4])?,
        });
    }
    for child in reader.objects("textureTransformBinds")? {
        let bind = child.reader();
        expression.texture_transform_binds.push(TextureTransformBind {
            material: bind.require_index("material")?,
            scale: bind.float_array("scale", [1.0, 1.0])?,
            offset: bind.float_array("offset", [0.0, 0.0])?,
        });
    }
    Ok(expression)
}

fn decode_vrm1(reader: ObjectReader<'_>, vrm: &mut Vrm1) -> Result<()> {
    vrm.spec_version = reader.require_string("specVersion")?;
    vrm.meta = decode_meta(reader.require_object("meta")?.reader())?;
    vrm.humanoid = decode_humanoid(reader.require_object("humanoid")?.reader())?;

    vrm.first_person = Vec::new();
    if let Some(child) = reader.object("firstPerson")? {
        for annotation in child.reader().objects("meshAnnotations")? {
            let annotation = annotation.reader();
            vrm.first_person.push(FirstPersonAnnotation {
                node: annotation.require_index("node")?,
                kind: annotation.enumeration(
                    "type",
                    FirstPersonType::Auto,
                    FirstPersonType::parse,
                )?,
            });
        }
    }

    vrm.look_at = reader
        .object("lookAt")?
        .map(|child| decode_look_at(child.reader()))
        .transpose()?;

    if let Some(child) = reader.object("expressions")? {
        let expressions = child.reader();
        for (name, child) in expressions.object_entries("preset")? {
            match ExpressionPreset::parse(name) {
                Some(preset) => {
                    let expression = decode_expression(child.reader())?;
                    vrm.expressions.preset.insert(preset, expression);
                }
                None => log_warn!("ignoring unknown expression preset '{name}'"),
            }
        }
        for (name, child) in expressions.object_entries("custom")? {
            let expression = decode_expression(child.reader())?;
            vrm.expressions.custom.insert(name.to_string(), expression);
        }
    }
    Ok(())
}

// ─── Encode ───────────────────────────────────────────────────────────────────

fn encode_meta(meta: &Meta) -> Value {
    let mut object = Map::new();
    object.insert("name".into(), json!(meta.name));
    if let Some(version) = &meta.version {
        object.insert("version".into(), json!(version));
    }
    object.insert("authors".into(), json!(meta.authors));
    if let Some(value) = &meta.copyright_information {
        object.insert("copyrightInformation".into(), json!(value));
    }
    if let Some(value) = &meta.contact_information {
        object.insert("contactInformation".into(), json!(value));
    }
    if !meta.references.is_empty() {
        object.insert("references".into(), json!(meta.references));
    }
    if let Some(value) = &meta.third_party_licenses {
        object.insert("thirdPartyLicenses".into(), json!(value));
    }
    if let Some(image) = meta.thumbnail_image {
        object.insert("thumbnailImage".into(), json!(image));
    }
    object.insert("licenseUrl".into(), json!(meta.license_url));
    object.insert("avatarPermission".into(), json!(meta.avatar_permission));
    object.insert(
        "allowExcessivelyViolentUsage".into(),
        json!(meta.allow_excessively_violent_usage),
    );
    object.insert(
        "allowExcessivelySexualUsage".into(),
        json!(meta.allow_excessively_sexual_usage),
    );
    object.insert("commercialUsage".into(), json!(meta.commercial_usage));
    object.insert(
        "allowPoliticalOrReligiousUsage".into(),
        json!(meta.allow_political_or_religious_usage),
    );
    object.insert(
        "allowAntisocialOrHateUsage".into(),
        json!(meta.allow_antisocial_or_hate_usage),
    );
    object.insert("creditNotation".into(), json!(meta.credit_notation));
    object.insert("allowRedistribution".into(), json!(meta.allow_redistribution));
    object.insert("modification".into(), json!(meta.modification));
    if let Some(value) = &meta.other_license_url {
        object.insert("otherLicenseUrl".into(), json!(value));
    }
    Value::Object(object)
}

fn encode_range_map(map: &RangeMap) -> Value {
    json!({
        "inputMaxValue": float_value(map.input_max_value),
        "outputScale": float_value(map.output_scale),
    })
}

fn encode_expression(expression: &Expression) -> Value {
    let mut object = Map::new();
    if !expression.morph_target_binds.is_empty() {
        let binds: Vec<Value> = expression
            .morph_target_binds
            .iter()
            .map(|bind| {
                let weight = float_value(bind.weight);
                json!({ "node": bind.node, "index": bind.index, "weight": weight })
            })
            .collect();
        object.insert("morphTargetBinds".into(), Value::Array(binds));
    }
    if !expression.material_color_binds.is_empty() {
        let binds: Vec<Value> = expression
            .material_color_binds
            .iter()
            .map(|bind| {
                json!({
                    "material": bind.material,
                    "type": bind.kind.as_str(),
                    "targetValue": floats_value(&bind.target_value),
                })
            })
            .collect();
        object.insert("materialColorBinds".into(), Value::Array(binds));
    }
    if !expression.texture_transform_binds.is_empty() {
        let binds: Vec<Value> = expression
            .texture_transform_binds
            .iter()
            .map(|bind| {
                json!({
                    "material": bind.material,
                    "scale": floats_value(&bind.scale),
                    "offset": floats_value(&bind.offset),
                })
            })
            .collect();
        object.insert("textureTransformBinds".into(), Value::Array(binds));
    }
    object.insert("isBinary".into(), json!(expression.is_binary));
    object.insert("overrideBlink".into(), json!(expression.override_blink.as_str()));
    object.insert("overrideLookAt".into(), json!(expression.override_look_at.as_str()));
    object.insert("overrideMouth".into(), json!(expression.override_mouth.as_str()));
    Value::Object(object)
}

fn encode_vrm1(vrm: &Vrm1) -> Result<Value> {
    for name in vrm.expressions.custom.keys() {
        if ExpressionPreset::parse(name).is_some() {
            return Err(VrmError::encoding(
                format!("{POINTER}/expressions/custom/{name}"),
                format!("custom expression '{name}' collides with a preset name"),
            ));
        }
    }

    let human_bones: Map<String, Value> = vrm
        .humanoid
        .iter()
        .map(|(bone, node)| (bone.as_str().to_string(), json!({ "node": node })))
        .collect();

    let mut object = Map::new();
    object.insert("specVersion".into(), json!(vrm.spec_version));
    object.insert("meta".into(), encode_meta(&vrm.meta));
    object.insert("humanoid".into(), json!({ "humanBones": human_bones }));

    if !vrm.first_person.is_empty() {
        let annotations: Vec<Value> = vrm
            .first_person
            .iter()
            .map(|annotation| json!({ "node": annotation.node, "type": annotation.kind.as_str() }))
            .collect();
        object.insert("firstPerson".into(), json!({ "meshAnnotations": annotations }));
    }

    if let Some(look_at) = &vrm.look_at {
        object.insert(
            "lookAt".into(),
            json!({
                "offsetFromHeadBone": floats_value(&look_at.offset_from_head_bone),
                "type": look_at.kind.as_str(),
                "rangeMapHorizontalInner": encode_range_map(&look_at.range_map_horizontal_inner),
                "rangeMapHorizontalOuter": encode_range_map(&look_at.range_map_horizontal_outer),
                "rangeMapVerticalDown": encode_range_map(&look_at.range_map_vertical_down),
                "rangeMapVerticalUp": encode_range_map(&look_at.range_map_vertical_up),
            }),
        );
    }

    let presets: Map<String, Value> = vrm
        .expressions
        .preset
        .iter()
        .map(|(preset, expression)| (preset.as_str().to_string(), encode_expression(expression)))
        .collect();
    let custom: Map<String, Value> = vrm
        .expressions
        .custom
        .iter()
        .map(|(name, expression)| (name.clone(), encode_expression(expression)))
        .collect();
    if !presets.is_empty() || !custom.is_empty() {
        let mut expressions = Map::new();
        if !presets.is_empty() {
            expressions.insert("preset".into(), Value::Object(presets));
        }
        if !custom.is_empty() {
            expressions.insert("custom".into(), Value::Object(custom));
        }
        object.insert("expressions".into(), Value::Object(expressions));
    }

    Ok(Value::Object(object))
}

// ─── Validate ─────────────────────────────────────────────────────────────────

fn validate_expression(
    document: &Document,
    expression: &Expression,
    pointer: &str,
    report: &mut IssueReport,
) {
    for (index, bind) in expression.morph_target_binds.iter().enumerate() {
        let bind_pointer = format!("{pointer}/morphTargetBinds/{index}");
        let Some(node) = document.nodes.get(bind.node) else {
            report.check_index(
                format!("{bind_pointer}/node"),
                bind.node,
                document.nodes.len(),
                "node",
            );
            continue;
        };
        let Some(mesh) = node.mesh.and_then(|mesh| document.meshes.get(mesh)) else {
            report.push(
                IssueKind::UnresolvedReference,
                format!("{bind_pointer}/node"),
                format!("node {} has no mesh to bind morph targets on", bind.node),
            );
            continue;
        };
        report.check_index(
            format!("{bind_pointer}/index"),
            bind.index,
            mesh.morph_target_count(),
            "morph target",
        );
    }
    for (index, bind) in expression.material_color_binds.iter().enumerate() {
        report.check_index(
            format!("{pointer}/materialColorBinds/{index}/material"),
            bind.material,
            document.materials.len(),
            "material",
        );
    }
    for (index, bind) in expression.texture_transform_binds.iter().enumerate() {
        report.check_index(
            format!("{pointer}/textureTransformBinds/{index}/material"),
            bind.material,
            document.materials.len(),
            "material",
        );
    }
}

impl ExtensionSchema for VrmcVrmSchema {
    fn generation(&self) -> SpecGeneration {
        SpecGeneration::Vrm1
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn scope(&self) -> SchemaScope {
        SchemaScope::Root
    }

    fn marks_generation(&self) -> bool {
        true
    }

    fn decode(
        &self,
        reader: ObjectReader<'_>,
        _target: SchemaTarget,
        document: &mut Document,
    ) -> Result<()> {
        let Some(vrm) = document.vrm1_mut() else {
            return Err(VrmError::schema(reader.pointer(), "VRM 1.0 document", "plain glTF"));
        };
        decode_vrm1(reader, vrm)
    }

    fn encode(&self, document: &Document, target: SchemaTarget) -> Result<Option<Value>> {
        match (target, document.vrm1()) {
            (SchemaTarget::Root, Some(vrm)) => encode_vrm1(vrm).map(Some),
            _ => Ok(None),
        }
    }

    fn validate(&self, document: &Document, graph: &NodeGraph, report: &mut IssueReport) {
        let Some(vrm) = document.vrm1() else {
            return;
        };

        let meta = &vrm.meta;
        if meta.name.trim().is_empty() {
            let pointer = format!("{POINTER}/meta/name");
            report.push(IssueKind::InvalidMeta, pointer, "meta.name is empty");
        }
        if meta.authors.is_empty() {
            report.push(
                IssueKind::InvalidMeta,
                format!("{POINTER}/meta/authors"),
                "meta.authors must list at least one author",
            );
        }
        if meta.license_url.trim().is_empty() {
            report.push(
                IssueKind::InvalidMeta,
                format!("{POINTER}/meta/licenseUrl"),
                "meta.licenseUrl is empty",
            );
        }
        if let Some(image) = meta.thumbnail_image {
            report.check_index(
                format!("{POINTER}/meta/thumbnailImage"),
                image,
                document.images.len(),
                "image",
            );
        }

        let assignments: Vec<BoneAssignment> = vrm
            .humanoid
            .iter()
            .map(|(bone, node)| BoneAssignment {
                bone: *bone,
                node: *node,
                pointer: format!("{POINTER}/humanoid/humanBones/{}/node", bone.as_str()),
            })
            .collect();
        check_humanoid(
            &assignments,
            SpecGeneration::Vrm1,
            &format!("{POINTER}/humanoid"),
            graph,
            report,
        );

        for (index, annotation) in vrm.first_person.iter().enumerate() {
            report.check_index(
                format!("{POINTER}/firstPerson/meshAnnotations/{index}/node"),
                annotation.node,
                document.nodes.len(),
                "node",
            );
        }

        for (preset, expression) in &vrm.expressions.preset {
            let pointer = format!("{POINTER}/expressions/preset/{}", preset.as_str());
            validate_expression(document, expression, &pointer, report);
        }
        for (name, expression) in &vrm.expressions.custom {
            let pointer = format!("{POINTER}/expressions/custom/{name}");
            validate_expression(document, expression, &pointer, report);
        }
    }

    fn mark_references(&self, document: &Document, marks: &mut ReferenceMarks) {
        if let Some(image) = document.vrm1().and_then(|vrm| vrm.meta.thumbnail_image) {
            marks.mark_image(image);
        }
    }

    fn remap(&self, document: &mut Document, tables: &RemapTables) -> Result<()> {
        let Some(vrm) = document.vrm1_mut() else {
            return Ok(());
        };

        let mut humanoid = BTreeMap::new();
        for (bone, node) in &vrm.humanoid {
            let pointer = format!("{POINTER}/humanoid/humanBones/{}/node", bone.as_str());
            if let Some(node) = remap_bone(*bone, *node, SpecGeneration::Vrm1, tables, &pointer)? {
                humanoid.insert(*bone, node);
            }
        }
        vrm.humanoid = humanoid;

        vrm.meta.thumbnail_image = vrm
            .meta
            .thumbnail_image
            .and_then(|image| tables.images.get(image));

        vrm.first_person.retain_mut(|annotation| match tables.nodes.get(annotation.node) {
            Some(node) => {
                annotation.node = node;
                true
            }
            None => false,
        });

        let expressions = vrm
            .expressions
            .preset
            .values_mut()
            .chain(vrm.expressions.custom.values_mut());
        for expression in expressions {
            expression.morph_target_binds.retain_mut(|bind| match tables.nodes.get(bind.node) {
                Some(node) => {
                    bind.node = node;
                    true
                }
                None => false,
            });
            expression
                .material_color_binds
                .retain_mut(|bind| match tables.materials.get(bind.material) {
                    Some(material) => {
                        bind.material = material;
                        true
                    }
                    None => false,
                });
            expression
                .texture_transform_binds
                .retain_mut(|bind| match tables.materials.get(bind.material) {
                    Some(material) => {
                        bind.material = material;
                        true
                    }
                    None => false,
                });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::VrmExtension;

    fn decode_value(value: &Value) -> Result<Vrm1> {
        let mut document = Document {
            vrm: Some(VrmExtension::empty(SpecGeneration::Vrm1)),
            ..Default::default()
        };
        let reader = ObjectReader::new(value, POINTER)?;
        VrmcVrmSchema.decode(reader, SchemaTarget::Root, &mut document)?;
        Ok(document.vrm1().cloned().unwrap_or_default())
    }

    fn minimal() -> Value {
        json!({
            "specVersion": "1.0",
            "meta": {
                "name": "Avatar",
                "authors": ["someone"],
                "licenseUrl": "https://vrm.dev/licenses/1.0/"
            },
            "humanoid": { "humanBones": { "hips": { "node": 0 }, "spine": { "node": 1 } } },
            "expressions": {
                "preset": {
                    "happy": { "morphTargetBinds": [{ "node": 2, "index": 0, "weight": 1.0 }] }
                },
                "custom": { "smug": { "isBinary": true } }
            }
        })
    }

    #[test]
    fn given_minimal_block_when_decoding_then_bones_and_expressions_are_typed() {
        let vrm = decode_value(&minimal()).expect("valid block");

        assert_eq!(vrm.humanoid.get(&HumanBone::Spine), Some(&1));
        assert_eq!(
            vrm.expressions.preset[&ExpressionPreset::Happy].morph_target_binds[0].node,
            2
        );
        assert!(vrm.expressions.custom["smug"].is_binary);
    }

    #[test]
    fn given_missing_license_when_decoding_then_schema_violation_is_returned() {
        let mut value = minimal();
        if let Some(meta) = value["meta"].as_object_mut() {
            meta.remove("licenseUrl");
        }

        let err = decode_value(&value).expect_err("licenseUrl is required");
        assert!(matches!(
            err,
            VrmError::SchemaViolation { ref path, .. }
                if path == "/extensions/VRMC_vrm/meta/licenseUrl"
        ));
    }

    #[test]
    fn given_decoded_block_when_encoding_then_decoding_again_is_identical() {
        let vrm = decode_value(&minimal()).expect("valid block");
        let encoded = encode_vrm1(&vrm).expect("encodable");
        assert_eq!(decode_value(&encoded).expect("re-decodes"), vrm);
    }

    #[test]
    fn given_custom_named_like_preset_when_encoding_then_constraint_is_violated() {
        let mut vrm = decode_value(&minimal()).expect("valid block");
        vrm.expressions.custom.insert("happy".to_string(), Expression::default());

        let err = encode_vrm1(&vrm).expect_err("name collision");
        assert!(matches!(err, VrmError::EncodingConstraintViolation { .. }));
    }
}
