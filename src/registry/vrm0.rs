//! `VRM`: the single flat extension of VRM 0.x.

use serde_json::{Map, Value, json};

use crate::decode::reader::{ObjectReader, expect_bool, expect_f32, expect_index, type_name};
use crate::document::{Document, SpecGeneration};
use crate::encode::remap::{IndexMap, ReferenceMarks, RemapTables};
use crate::error::{Result, VrmError};
use crate::validate::humanoid::{BoneAssignment, check_humanoid};
use crate::validate::{IssueKind, IssueReport, NodeGraph};
use crate::vrm::HumanBone;
use crate::vrm::vrm0::{
    Vrm0, Vrm0BlendShapeBind, Vrm0BlendShapeGroup, Vrm0BoneGroup, Vrm0Collider,
    Vrm0ColliderGroup, Vrm0DegreeMap, Vrm0FirstPerson, Vrm0HumanBone, Vrm0Humanoid,
    Vrm0MaterialProperties, Vrm0MaterialValue, Vrm0MeshAnnotation, Vrm0Meta,
    Vrm0SecondaryAnimation,
};
use crate::{log_debug, log_warn};

use super::{ExtensionSchema, SchemaScope, SchemaTarget, float_value, floats_value, remap_bone};

const NAME: &str = "VRM";
const POINTER: &str = "/extensions/VRM";

pub struct Vrm0Schema;

// ─── Decode ───────────────────────────────────────────────────────────────────

fn decode_meta(reader: ObjectReader<'_>) -> Result<Vrm0Meta> {
    Ok(Vrm0Meta {
        title: reader.string("title")?,
        version: reader.string("version")?,
        author: reader.string("author")?,
        contact_information: reader.string("contactInformation")?,
        reference: reader.string("reference")?,
        texture: reader.vrm0_index("texture")?,
        allowed_user_name: reader.string("allowedUserName")?,
        violent_ussage_name: reader.string("violentUssageName")?,
        sexual_ussage_name: reader.string("sexualUssageName")?,
        commercial_ussage_name: reader.string("commercialUssageName")?,
        other_permission_url: reader.string("otherPermissionUrl")?,
        license_name: reader.string("licenseName")?,
        other_license_url: reader.string("otherLicenseUrl")?,
    })
}

fn decode_humanoid(reader: ObjectReader<'_>) -> Result<Vrm0Humanoid> {
    let defaults = Vrm0Humanoid::default();
    let mut human_bones = Vec::new();
    for child in reader.objects("humanBones")? {
        let entry = child.reader();
        let name = entry.require_string("bone")?;
        let Some(bone) = HumanBone::from_vrm0_name(&name) else {
            log_warn!("ignoring unknown human bone '{name}' at {}", entry.pointer());
            continue;
        };
        let Some(node) = entry.vrm0_index("node")? else {
            log_debug!("human bone '{name}' has no node; skipped");
            continue;
        };
        human_bones.push(Vrm0HumanBone {
            bone,
            node,
            use_default_values: entry.bool_or("useDefaultValues", true)?,
        });
    }

    Ok(Vrm0Humanoid {
        human_bones,
        arm_stretch: reader.f32_or("armStretch", defaults.arm_stretch)?,
        leg_stretch: reader.f32_or("legStretch", defaults.leg_stretch)?,
        upper_arm_twist: reader.f32_or("upperArmTwist", defaults.upper_arm_twist)?,
        lower_arm_twist: reader.f32_or("lowerArmTwist", defaults.lower_arm_twist)?,
        upper_leg_twist: reader.f32_or("upperLegTwist", defaults.upper_leg_twist)?,
        lower_leg_twist: reader.f32_or("lowerLegTwist", defaults.lower_leg_twist)?,
        feet_spacing: reader.f32_or("feetSpacing", defaults.feet_spacing)?,
        has_translation_dof: reader.bool_or("hasTranslationDoF", defaults.has_translation_dof)?,
    })
}

fn decode_degree_map(reader: ObjectReader<'_>, key: &str) -> Result<Vrm0DegreeMap> {
    let defaults = Vrm0DegreeMap::default();
    let Some(child) = reader.object(key)? else {
        return Ok(defaults);
    };
    let map = child.reader();
    Ok(Vrm0DegreeMap {
        curve: if map.contains("curve") {
            map.floats("curve")?
        } else {
            defaults.curve
        },
        x_range: map.f32_or("xRange", defaults.x_range)?,
        y_range: map.f32_or("yRange", defaults.y_range)?,
    })
}

fn decode_first_person(reader: ObjectReader<'_>) -> Result<Vrm0FirstPerson> {
    let defaults = Vrm0FirstPerson::default();
    let mut mesh_annotations = Vec::new();
    for child in reader.objects("meshAnnotations")? {
        let annotation = child.reader();
        let Some(mesh) = annotation.vrm0_index("mesh")? else {
            continue;
        };
        mesh_annotations.push(Vrm0MeshAnnotation {
            mesh,
            first_person_flag: annotation.string_or("firstPersonFlag", "Auto")?,
        });
    }

    Ok(Vrm0FirstPerson {
        first_person_bone: reader.vrm0_index("firstPersonBone")?,
        first_person_bone_offset: reader
            .vector3_object("firstPersonBoneOffset", defaults.first_person_bone_offset)?,
        mesh_annotations,
        look_at_type_name: reader.string_or("lookAtTypeName", &defaults.look_at_type_name)?,
        look_at_horizontal_inner: decode_degree_map(reader, "lookAtHorizontalInner")?,
        look_at_horizontal_outer: decode_degree_map(reader, "lookAtHorizontalOuter")?,
        look_at_vertical_down: decode_degree_map(reader, "lookAtVerticalDown")?,
        look_at_vertical_up: decode_degree_map(reader, "lookAtVerticalUp")?,
    })
}

fn decode_blend_shape_group(reader: ObjectReader<'_>) -> Result<Vrm0BlendShapeGroup> {
    let mut binds = Vec::new();
    for child in reader.objects("binds")? {
        let bind = child.reader();
        let (Some(mesh), Some(index)) = (bind.vrm0_index("mesh")?, bind.vrm0_index("index")?)
        else {
            continue;
        };
        binds.push(Vrm0BlendShapeBind {
            mesh,
            index,
            weight: bind.f32_or("weight", 0.0)?,
        });
    }

    let mut material_values = Vec::new();
    for child in reader.objects("materialValues")? {
        let value = child.reader();
        material_values.push(Vrm0MaterialValue {
            material_name: value.require_string("materialName")?,
            property_name: value.require_string("propertyName")?,
            target_value: value.floats("targetValue")?,
        });
    }

    Ok(Vrm0BlendShapeGroup {
        name: reader.string_or("name", "")?,
        preset_name: reader.string_or("presetName", "unknown")?,
        binds,
        material_values,
        is_binary: reader.bool_or("isBinary", false)?,
    })
}

fn decode_secondary_animation(reader: ObjectReader<'_>) -> Result<Vrm0SecondaryAnimation> {
    let mut secondary = Vrm0SecondaryAnimation::default();

    for child in reader.objects("boneGroups")? {
        let group = child.reader();
        let defaults = Vrm0BoneGroup::default();
        secondary.bone_groups.push(Vrm0BoneGroup {
            comment: group.string("comment")?,
            stiffness: group.f32_or("stiffiness", defaults.stiffness)?,
            gravity_power: group.f32_or("gravityPower", defaults.gravity_power)?,
            gravity_dir: group.vector3_object("gravityDir", defaults.gravity_dir)?,
            drag_force: group.f32_or("dragForce", defaults.drag_force)?,
            center: group.vrm0_index("center")?,
            hit_radius: group.f32_or("hitRadius", defaults.hit_radius)?,
            bones: group.indices("bones")?,
            collider_groups: group.indices("colliderGroups")?,
        });
    }

    for child in reader.objects("colliderGroups")? {
        let group = child.reader();
        let mut colliders = Vec::new();
        for collider in group.objects("colliders")? {
            let collider = collider.reader();
            colliders.push(Vrm0Collider {
                offset: collider.vector3_object("offset", [0.0; 3])?,
                radius: collider.f32_or("radius", 0.0)?,
            });
        }
        secondary.collider_groups.push(Vrm0ColliderGroup {
            node: group.require_index("node")?,
            colliders,
        });
    }

    Ok(secondary)
}

fn decode_material_properties(reader: ObjectReader<'_>) -> Result<Vrm0MaterialProperties> {
    let vector = |value: &Value, pointer: &str| -> Result<Vec<f32>> {
        let items = value
            .as_array()
            .ok_or_else(|| VrmError::schema(pointer, "array", type_name(value)))?;
        items
            .iter()
            .enumerate()
            .map(|(index, item)| expect_f32(item, &format!("{pointer}/{index}")))
            .collect()
    };
    let string = |value: &Value, pointer: &str| -> Result<String> {
        value
            .as_str()
            .map(ToOwned::to_owned)
            .ok_or_else(|| VrmError::schema(pointer, "string", type_name(value)))
    };

    Ok(Vrm0MaterialProperties {
        name: reader.string_or("name", "")?,
        shader: reader.string_or("shader", "")?,
        render_queue: reader.i64_or("renderQueue", -1)?,
        float_properties: reader.scalar_map("floatProperties", expect_f32)?,
        vector_properties: reader.scalar_map("vectorProperties", vector)?,
        texture_properties: reader.scalar_map("textureProperties", expect_index)?,
        keyword_map: reader.scalar_map("keywordMap", expect_bool)?,
        tag_map: reader.scalar_map("tagMap", string)?,
    })
}

fn decode_vrm0(reader: ObjectReader<'_>) -> Result<Vrm0> {
    let mut vrm = Vrm0 {
        exporter_version: reader.string("exporterVersion")?,
        spec_version: reader.string("specVersion")?,
        ..Default::default()
    };
    if let Some(child) = reader.object("meta")? {
        vrm.meta = decode_meta(child.reader())?;
    }
    if let Some(child) = reader.object("humanoid")? {
        vrm.humanoid = decode_humanoid(child.reader())?;
    }
    if let Some(child) = reader.object("firstPerson")? {
        vrm.first_person = decode_first_person(child.reader())?;
    }
    if let Some(child) = reader.object("blendShapeMaster")? {
        for group in child.reader().objects("blendShapeGroups")? {
            vrm.blend_shape_master
                .push(decode_blend_shape_group(group.reader())?);
        }
    }
    if let Some(child) = reader.object("secondaryAnimation")? {
        vrm.secondary_animation = decode_secondary_animation(child.reader())?;
    }
    for child in reader.objects("materialProperties")? {
        vrm.material_properties
            .push(decode_material_properties(child.reader())?);
    }
    Ok(vrm)
}

// ─── Encode ───────────────────────────────────────────────────────────────────

fn vector3_value(vector: [f32; 3]) -> Value {
    json!({
        "x": float_value(vector[0]),
        "y": float_value(vector[1]),
        "z": float_value(vector[2]),
    })
}

fn insert_opt(object: &mut Map<String, Value>, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        object.insert(key.to_string(), json!(value));
    }
}

fn encode_meta(meta: &Vrm0Meta) -> Value {
    let mut object = Map::new();
    insert_opt(&mut object, "title", &meta.title);
    insert_opt(&mut object, "version", &meta.version);
    insert_opt(&mut object, "author", &meta.author);
    insert_opt(&mut object, "contactInformation", &meta.contact_information);
    insert_opt(&mut object, "reference", &meta.reference);
    object.insert(
        "texture".into(),
        json!(meta.texture.map_or(-1, |texture| texture as i64)),
    );
    insert_opt(&mut object, "allowedUserName", &meta.allowed_user_name);
    insert_opt(&mut object, "violentUssageName", &meta.violent_ussage_name);
    insert_opt(&mut object, "sexualUssageName", &meta.sexual_ussage_name);
    insert_opt(&mut object, "commercialUssageName", &meta.commercial_ussage_name);
    insert_opt(&mut object, "otherPermissionUrl", &meta.other_permission_url);
    insert_opt(&mut object, "licenseName", &meta.license_name);
    insert_opt(&mut object, "otherLicenseUrl", &meta.other_license_url);
    Value::Object(object)
}

fn encode_humanoid(humanoid: &Vrm0Humanoid) -> Value {
    let bones: Vec<Value> = humanoid
        .human_bones
        .iter()
        .map(|bone| {
            json!({
                "bone": bone.bone.vrm0_name(),
                "node": bone.node,
                "useDefaultValues": bone.use_default_values,
            })
        })
        .collect();
    json!({
        "humanBones": bones,
        "armStretch": float_value(humanoid.arm_stretch),
        "legStretch": float_value(humanoid.leg_stretch),
        "upperArmTwist": float_value(humanoid.upper_arm_twist),
        "lowerArmTwist": float_value(humanoid.lower_arm_twist),
        "upperLegTwist": float_value(humanoid.upper_leg_twist),
        "lowerLegTwist": float_value(humanoid.lower_leg_twist),
        "feetSpacing": float_value(humanoid.feet_spacing),
        "hasTranslationDoF": humanoid.has_translation_dof,
    })
}

fn encode_degree_map(map: &Vrm0DegreeMap) -> Value {
    json!({
        "curve": floats_value(&map.curve),
        "xRange": float_value(map.x_range),
        "yRange": float_value(map.y_range),
    })
}

fn encode_first_person(first_person: &Vrm0FirstPerson) -> Value {
    let annotations: Vec<Value> = first_person
        .mesh_annotations
        .iter()
        .map(|annotation| {
            json!({ "mesh": annotation.mesh, "firstPersonFlag": annotation.first_person_flag })
        })
        .collect();
    json!({
        "firstPersonBone": first_person.first_person_bone.map_or(-1, |node| node as i64),
        "firstPersonBoneOffset": vector3_value(first_person.first_person_bone_offset),
        "meshAnnotations": annotations,
        "lookAtTypeName": first_person.look_at_type_name,
        "lookAtHorizontalInner": encode_degree_map(&first_person.look_at_horizontal_inner),
        "lookAtHorizontalOuter": encode_degree_map(&first_person.look_at_horizontal_outer),
        "lookAtVerticalDown": encode_degree_map(&first_person.look_at_vertical_down),
        "lookAtVerticalUp": encode_degree_map(&first_person.look_at_vertical_up),
    })
}

fn encode_blend_shape_group(group: &Vrm0BlendShapeGroup) -> Value {
    let binds: Vec<Value> = group
        .binds
        .iter()
        .map(|bind| {
            json!({ "mesh": bind.mesh, "index": bind.index, "weight": float_value(bind.weight) })
        })
        .collect();
    let material_values: Vec<Value> = group
        .material_values
        .iter()
        .map(|value| {
            json!({
                "materialName": value.material_name,
                "propertyName": value.property_name,
                "targetValue": floats_value(&value.target_value),
            })
        })
        .collect();
    json!({
        "name": group.name,
        "presetName": group.preset_name,
        "binds": binds,
        "materialValues": material_values,
        "isBinary": group.is_binary,
    })
}

fn encode_secondary_animation(secondary: &Vrm0SecondaryAnimation) -> Value {
    let bone_groups: Vec<Value> = secondary
        .bone_groups
        .iter()
        .map(|group| {
            let mut object = Map::new();
            if let Some(comment) = &group.comment {
                object.insert("comment".into(), json!(comment));
            }
            object.insert("stiffiness".into(), float_value(group.stiffness));
            object.insert("gravityPower".into(), float_value(group.gravity_power));
            object.insert("gravityDir".into(), vector3_value(group.gravity_dir));
            object.insert("dragForce".into(), float_value(group.drag_force));
            object.insert(
                "center".into(),
                json!(group.center.map_or(-1, |node| node as i64)),
            );
            object.insert("hitRadius".into(), float_value(group.hit_radius));
            object.insert("bones".into(), json!(group.bones));
            object.insert("colliderGroups".into(), json!(group.collider_groups));
            Value::Object(object)
        })
        .collect();
    let collider_groups: Vec<Value> = secondary
        .collider_groups
        .iter()
        .map(|group| {
            let colliders: Vec<Value> = group
                .colliders
                .iter()
                .map(|collider| {
                    json!({
                        "offset": vector3_value(collider.offset),
                        "radius": float_value(collider.radius)
                    })
                })
                .collect();
            json!({ "node": group.node, "colliders": colliders })
        })
        .collect();
    json!({ "boneGroups": bone_groups, "colliderGroups": collider_groups })
}

fn encode_material_properties(properties: &Vrm0MaterialProperties) -> Value {
    let floats: Map<String, Value> = properties
        .float_properties
        .iter()
        .map(|(key, value)| (key.clone(), float_value(*value)))
        .collect();
    let vectors: Map<String, Value> = properties
        .vector_properties
        .iter()
        .map(|(key, values)| (key.clone(), floats_value(values)))
        .collect();
    json!({
        "name": properties.name,
        "shader": properties.shader,
        "renderQueue": properties.render_queue,
        "floatProperties": floats,
        "vectorProperties": vectors,
        "textureProperties": properties.texture_properties,
        "keywordMap": properties.keyword_map,
        "tagMap": properties.tag_map,
    })
}

fn encode_vrm0(vrm: &Vrm0) -> Value {
    let mut object = Map::new();
    insert_opt(&mut object, "exporterVersion", &vrm.exporter_version);
    insert_opt(&mut object, "specVersion", &vrm.spec_version);
    object.insert("meta".into(), encode_meta(&vrm.meta));
    object.insert("humanoid".into(), encode_humanoid(&vrm.humanoid));
    object.insert("firstPerson".into(), encode_first_person(&vrm.first_person));
    let groups: Vec<Value> = vrm
        .blend_shape_master
        .iter()
        .map(encode_blend_shape_group)
        .collect();
    object.insert("blendShapeMaster".into(), json!({ "blendShapeGroups": groups }));
    object.insert(
        "secondaryAnimation".into(),
        encode_secondary_animation(&vrm.secondary_animation),
    );
    let properties: Vec<Value> = vrm
        .material_properties
        .iter()
        .map(encode_material_properties)
        .collect();
    object.insert("materialProperties".into(), Value::Array(properties));
    Value::Object(object)
}

// ─── Validate ─────────────────────────────────────────────────────────────────

fn validate_vrm0(vrm: &Vrm0, document: &Document, graph: &NodeGraph, report: &mut IssueReport) {
    if let Some(texture) = vrm.meta.texture {
        report.check_index(
            format!("{POINTER}/meta/texture"),
            texture,
            document.textures.len(),
            "texture",
        );
    }

    let assignments: Vec<BoneAssignment> = vrm
        .humanoid
        .human_bones
        .iter()
        .enumerate()
        .map(|(index, bone)| BoneAssignment {
            bone: bone.bone,
            node: bone.node,
            pointer: format!("{POINTER}/humanoid/humanBones/{index}/node"),
        })
        .collect();
    check_humanoid(
        &assignments,
        SpecGeneration::Vrm0,
        &format!("{POINTER}/humanoid"),
        graph,
        report,
    );

    let first_person = &vrm.first_person;
    if let Some(node) = first_person.first_person_bone {
        report.check_index(
            format!("{POINTER}/firstPerson/firstPersonBone"),
            node,
            document.nodes.len(),
            "node",
        );
    }
    for (index, annotation) in first_person.mesh_annotations.iter().enumerate() {
        report.check_index(
            format!("{POINTER}/firstPerson/meshAnnotations/{index}/mesh"),
            annotation.mesh,
            document.meshes.len(),
            "mesh",
        );
    }

    for (group_index, group) in vrm.blend_shape_master.iter().enumerate() {
        let pointer = format!("{POINTER}/blendShapeMaster/blendShapeGroups/{group_index}");
        for (index, bind) in group.binds.iter().enumerate() {
            let Some(mesh) = document.meshes.get(bind.mesh) else {
                report.check_index(
                    format!("{pointer}/binds/{index}/mesh"),
                    bind.mesh,
                    document.meshes.len(),
                    "mesh",
                );
                continue;
            };
            report.check_index(
                format!("{pointer}/binds/{index}/index"),
                bind.index,
                mesh.morph_target_count(),
                "morph target",
            );
        }
        for (index, value) in group.material_values.iter().enumerate() {
            if document.material_by_name(&value.material_name).is_none() {
                report.push(
                    IssueKind::UnknownMaterialName,
                    format!("{pointer}/materialValues/{index}/materialName"),
                    format!("no material named '{}'", value.material_name),
                );
            }
        }
    }

    let secondary = &vrm.secondary_animation;
    for (group_index, group) in secondary.bone_groups.iter().enumerate() {
        let pointer = format!("{POINTER}/secondaryAnimation/boneGroups/{group_index}");
        for (index, &bone) in group.bones.iter().enumerate() {
            report.check_index(
                format!("{pointer}/bones/{index}"),
                bone,
                document.nodes.len(),
                "node",
            );
        }
        for (index, &collider_group) in group.collider_groups.iter().enumerate() {
            report.check_index(
                format!("{pointer}/colliderGroups/{index}"),
                collider_group,
                secondary.collider_groups.len(),
                "collider group",
            );
        }
        if let Some(center) = group.center {
            report.check_index(format!("{pointer}/center"), center, document.nodes.len(), "node");
        }
    }
    for (index, group) in secondary.collider_groups.iter().enumerate() {
        report.check_index(
            format!("{POINTER}/secondaryAnimation/colliderGroups/{index}/node"),
            group.node,
            document.nodes.len(),
            "node",
        );
    }

    for (index, properties) in vrm.material_properties.iter().enumerate() {
        for (key, &texture) in &properties.texture_properties {
            report.check_index(
                format!("{POINTER}/materialProperties/{index}/textureProperties/{key}"),
                texture,
                document.textures.len(),
                "texture",
            );
        }
    }
}

// ─── Remap ────────────────────────────────────────────────────────────────────

fn remap_vrm0(
    vrm: &mut Vrm0,
    material_names: &[Option<String>],
    tables: &RemapTables,
) -> Result<()> {
    let mut human_bones = Vec::with_capacity(vrm.humanoid.human_bones.len());
    for (index, bone) in vrm.humanoid.human_bones.iter().enumerate() {
        let pointer = format!("{POINTER}/humanoid/humanBones/{index}/node");
        let node = remap_bone(bone.bone, bone.node, SpecGeneration::Vrm0, tables, &pointer)?;
        if let Some(node) = node {
            human_bones.push(Vrm0HumanBone { node, ..bone.clone() });
        }
    }
    vrm.humanoid.human_bones = human_bones;

    vrm.meta.texture = vrm.meta.texture.and_then(|texture| tables.textures.get(texture));

    let first_person = &mut vrm.first_person;
    first_person.first_person_bone = first_person
        .first_person_bone
        .and_then(|node| tables.nodes.get(node));
    first_person
        .mesh_annotations
        .retain_mut(|annotation| match tables.meshes.get(annotation.mesh) {
            Some(mesh) => {
                annotation.mesh = mesh;
                true
            }
            None => false,
        });

    for group in &mut vrm.blend_shape_master {
        group.binds.retain_mut(|bind| match tables.meshes.get(bind.mesh) {
            Some(mesh) => {
                bind.mesh = mesh;
                true
            }
            None => false,
        });
        group.material_values.retain(|value| {
            material_names
                .iter()
                .any(|name| name.as_deref() == Some(value.material_name.as_str()))
        });
    }

    let secondary = &mut vrm.secondary_animation;
    let kept_groups: Vec<bool> = secondary
        .collider_groups
        .iter()
        .map(|group| tables.nodes.get(group.node).is_some())
        .collect();
    let group_map = IndexMap::from_marks(&kept_groups);
    secondary.collider_groups = group_map.retain(std::mem::take(&mut secondary.collider_groups));
    for group in &mut secondary.collider_groups {
        group.node = tables.nodes.require(group.node, POINTER)?;
    }
    for group in &mut secondary.bone_groups {
        group.bones = group
            .bones
            .iter()
            .filter_map(|bone| tables.nodes.get(*bone))
            .collect();
        group.collider_groups = group
            .collider_groups
            .iter()
            .filter_map(|index| group_map.get(*index))
            .collect();
        group.center = group.center.and_then(|node| tables.nodes.get(node));
    }
    secondary.bone_groups.retain(|group| !group.bones.is_empty());

    vrm.material_properties.retain(|properties| {
        material_names
            .iter()
            .any(|name| name.as_deref() == Some(properties.name.as_str()))
    });
    for properties in &mut vrm.material_properties {
        properties.texture_properties = std::mem::take(&mut properties.texture_properties)
            .into_iter()
            .filter_map(|(key, texture)| tables.textures.get(texture).map(|texture| (key, texture)))
            .collect();
    }
    Ok(())
}

impl ExtensionSchema for Vrm0Schema {
    fn generation(&self) -> SpecGeneration {
        SpecGeneration::Vrm0
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
        let Some(vrm) = document.vrm0_mut() else {
            return Err(VrmError::schema(reader.pointer(), "VRM 0.x document", "plain glTF"));
        };
        *vrm = decode_vrm0(reader)?;
        Ok(())
    }

    fn encode(&self, document: &Document, target: SchemaTarget) -> Result<Option<Value>> {
        match (target, document.vrm0()) {
            (SchemaTarget::Root, Some(vrm)) => Ok(Some(encode_vrm0(vrm))),
            _ => Ok(None),
        }
    }

    fn validate(&self, document: &Document, graph: &NodeGraph, report: &mut IssueReport) {
        if let Some(vrm) = document.vrm0() {
            validate_vrm0(vrm, document, graph, report);
        }
    }

    fn mark_references(&self, document: &Document, marks: &mut ReferenceMarks) {
        let Some(vrm) = document.vrm0() else {
            return;
        };
        if let Some(texture) = vrm.meta.texture {
            marks.mark_texture(texture);
        }
        // Shader textures of kept materials, matched by material name.
        let kept_names: Vec<&str> = document
            .materials
            .iter()
            .enumerate()
            .filter(|(index, _)| marks.materials.get(*index).copied().unwrap_or(false))
            .filter_map(|(_, material)| material.name.as_deref())
            .collect();
        for properties in &vrm.material_properties {
            if kept_names.contains(&properties.name.as_str()) {
                for &texture in properties.texture_properties.values() {
                    marks.mark_texture(texture);
                }
            }
        }
    }

    fn remap(&self, document: &mut Document, tables: &RemapTables) -> Result<()> {
        let material_names: Vec<Option<String>> = document
            .materials
            .iter()
            .map(|material| material.name.clone())
            .collect();
        match document.vrm0_mut() {
            Some(vrm) => remap_vrm0(vrm, &material_names, tables),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::VrmExtension;

    fn decode_value(value: &Value) -> Result<Vrm0> {
        let mut document = Document {
            vrm: Some(VrmExtension::empty(SpecGeneration::Vrm0)),
            ..Default::default()
        };
        Vrm0Schema.decode(ObjectReader::new(value, POINTER)?, SchemaTarget::Root, &mut document)?;
        Ok(document.vrm0().cloned().unwrap_or_default())
    }

    #[test]
    fn given_sentinels_and_thumb_names_when_decoding_then_vocabulary_is_normalized() {
        let value = json!({
            "meta": { "title": "Old", "texture": -1 },
            "humanoid": { "humanBones": [
                { "bone": "hips", "node": 0 },
                { "bone": "leftThumbProximal", "node": 4 },
                { "bone": "tail", "node": 5 },
                { "bone": "spine", "node": -1 }
            ] },
            "secondaryAnimation": { "boneGroups": [{ "stiffiness": 0.7, "bones": [3] }] }
        });

        let vrm = decode_value(&value).expect("valid block");

        assert_eq!(vrm.meta.texture, None);
        assert_eq!(vrm.humanoid.human_bones.len(), 2);
        assert_eq!(vrm.humanoid.human_bones[1].bone, HumanBone::LeftThumbMetacarpal);
        assert_eq!(vrm.secondary_animation.bone_groups[0].stiffness, 0.7);
        assert_eq!(vrm.secondary_animation.bone_groups[0].drag_force, 0.4);
    }

    #[test]
    fn given_decoded_block_when_encoding_then_decoding_again_is_identical() {
        let value = json!({
            "exporterVersion": "UniVRM-0.99",
            "meta": { "title": "Old", "author": "someone", "texture": 0 },
            "humanoid": { "humanBones": [{ "bone": "leftThumbIntermediate", "node": 2 }] },
            "firstPerson": {
                "firstPersonBone": 1,
                "firstPersonBoneOffset": { "x": 0.0, "y": 0.1, "z": 0.0 }
            },
            "blendShapeMaster": { "blendShapeGroups": [{
                "name": "Joy", "presetName": "joy",
                "binds": [{ "mesh": 0, "index": 1, "weight": 100 }],
                "materialValues": [{
                    "materialName": "Face", "propertyName": "_Color", "targetValue": [1, 0, 0, 1]
                }]
            }] },
            "materialProperties": [{
                "name": "Face", "shader": "VRM/MToon", "renderQueue": 2000,
                "floatProperties": { "_ShadeToony": 0.9 },
                "vectorProperties": { "_Color": [1, 1, 1, 1] },
                "textureProperties": { "_MainTex": 0 },
                "keywordMap": { "_NORMALMAP": false },
                "tagMap": { "RenderType": "Opaque" }
            }]
        });

        let vrm = decode_value(&value).expect("valid block");
        let encoded = encode_vrm0(&vrm);

        assert_eq!(encoded["humanoid"]["humanBones"][0]["bone"], "leftThumbIntermediate");
        assert_eq!(decode_value(&encoded).expect("re-decodes"), vrm);
    }

    #[test]
    fn given_wrong_vector_property_when_decoding_then_pointer_names_property() {
        let value = json!({
            "materialProperties": [{ "name": "Face", "vectorProperties": { "_Color": "red" } }]
        });

        let err = decode_value(&value).expect_err("vector must be an array");
        assert!(matches!(
            err,
            VrmError::SchemaViolation { ref path, .. }
                if path == "/extensions/VRM/materialProperties/0/vectorProperties/_Color"
        ));
    }

    #[test]
    fn given_vrm0_role_listed_twice_when_validating_then_duplicate_assignment_is_reported() {
        let mut document = crate::fixtures::vrm0_document();
        let Some(vrm) = document.vrm0_mut() else {
            panic!("fixture carries a VRM 0.x block");
        };
        let repeated = vrm.humanoid.human_bones[0].clone();
        vrm.humanoid.human_bones.push(repeated);
        let index = vrm.humanoid.human_bones.len() - 1;

        let graph = NodeGraph::build(&document.nodes);
        let mut report = IssueReport::new();
        Vrm0Schema.validate(&document, &graph, &mut report);

        let duplicates: Vec<_> = report
            .issues()
            .iter()
            .filter(|issue| issue.code == IssueKind::DuplicateBoneAssignment)
            .collect();
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].pointer, format!("{POINTER}/humanoid/humanBones/{index}/node"));
    }
}
