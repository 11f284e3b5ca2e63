//! `VRMC_springBone`: colliders, collider groups and joint chains (1.0).

use serde_json::{Map, Value, json};

use crate::decode::reader::ObjectReader;
use crate::document::{Document, SpecGeneration};
use crate::encode::remap::{IndexMap, RemapTables};
use crate::error::{Result, VrmError};
use crate::validate::spring::check_chain;
use crate::validate::{IssueReport, NodeGraph};
use crate::vrm::vrm1::{Collider, ColliderGroup, ColliderShape, Spring, SpringBone, SpringJoint};
use crate::log_debug;

use super::{ExtensionSchema, SchemaScope, SchemaTarget, float_value, floats_value};

const NAME: &str = "VRMC_springBone";
const POINTER: &str = "/extensions/VRMC_springBone";

pub struct SpringBoneSchema;

// ─── Decode ───────────────────────────────────────────────────────────────────

fn decode_collider(reader: ObjectReader<'_>) -> Result<Collider> {
    let node = reader.require_index("node")?;
    let shape = reader.require_object("shape")?;
    let shape = shape.reader();

    let shape = if let Some(sphere) = shape.object("sphere")? {
        let sphere = sphere.reader();
        ColliderShape::Sphere {
            offset: sphere.float_array("offset", [0.0; 3])?,
            radius: sphere.f32_or("radius", 0.0)?,
        }
    } else if let Some(capsule) = shape.object("capsule")? {
        let capsule = capsule.reader();
        ColliderShape::Capsule {
            offset: capsule.float_array("offset", [0.0; 3])?,
            radius: capsule.f32_or("radius", 0.0)?,
            tail: capsule.float_array("tail", [0.0; 3])?,
        }
    } else {
        return Err(VrmError::schema(shape.pointer(), "sphere or capsule", "neither"));
    };

    Ok(Collider { node, shape })
}

fn decode_joint(reader: ObjectReader<'_>) -> Result<SpringJoint> {
    let defaults = SpringJoint::new(reader.require_index("node")?);
    Ok(SpringJoint {
        hit_radius: reader.f32_or("hitRadius", defaults.hit_radius)?,
        stiffness: reader.f32_or("stiffness", defaults.stiffness)?,
        gravity_power: reader.f32_or("gravityPower", defaults.gravity_power)?,
        gravity_dir: reader.float_array("gravityDir", defaults.gravity_dir)?,
        drag_force: reader.f32_or("dragForce", defaults.drag_force)?,
        ..defaults
    })
}

fn decode_spring_bone(reader: ObjectReader<'_>) -> Result<SpringBone> {
    let mut spring_bone = SpringBone {
        spec_version: reader.string_or("specVersion", "1.0")?,
        ..Default::default()
    };
    for child in reader.objects("colliders")? {
        spring_bone.colliders.push(decode_collider(child.reader())?);
    }
    for child in reader.objects("colliderGroups")? {
        let group = child.reader();
        spring_bone.collider_groups.push(ColliderGroup {
            name: group.string("name")?,
            colliders: group.indices("colliders")?,
        });
    }
    for child in reader.objects("springs")? {
        let spring = child.reader();
        let mut joints = Vec::new();
        for joint in spring.objects("joints")? {
            joints.push(decode_joint(joint.reader())?);
        }
        spring_bone.springs.push(Spring {
            name: spring.string("name")?,
            joints,
            collider_groups: spring.indices("colliderGroups")?,
            center: spring.index("center")?,
        });
    }
    Ok(spring_bone)
}

// ─── Encode ───────────────────────────────────────────────────────────────────

fn encode_collider(collider: &Collider) -> Value {
    let shape = match &collider.shape {
        ColliderShape::Sphere { offset, radius } => json!({
            "sphere": { "offset": floats_value(offset), "radius": float_value(*radius) }
        }),
        ColliderShape::Capsule {
            offset,
            radius,
            tail,
        } => json!({
            "capsule": {
                "offset": floats_value(offset),
                "radius": float_value(*radius),
                "tail": floats_value(tail),
            }
        }),
    };
    json!({ "node": collider.node, "shape": shape })
}

fn encode_spring(spring: &Spring) -> Value {
    let joints: Vec<Value> = spring
        .joints
        .iter()
        .map(|joint| {
            json!({
                "node": joint.node,
                "hitRadius": float_value(joint.hit_radius),
                "stiffness": float_value(joint.stiffness),
                "gravityPower": float_value(joint.gravity_power),
                "gravityDir": floats_value(&joint.gravity_dir),
                "dragForce": float_value(joint.drag_force),
            })
        })
        .collect();

    let mut object = Map::new();
    if let Some(name) = &spring.name {
        object.insert("name".into(), json!(name));
    }
    object.insert("joints".into(), Value::Array(joints));
    if !spring.collider_groups.is_empty() {
        object.insert("colliderGroups".into(), json!(spring.collider_groups));
    }
    if let Some(center) = spring.center {
        object.insert("center".into(), json!(center));
    }
    Value::Object(object)
}

fn encode_spring_bone(spring_bone: &SpringBone) -> Value {
    let colliders: Vec<Value> = spring_bone.colliders.iter().map(encode_collider).collect();
    let groups: Vec<Value> = spring_bone
        .collider_groups
        .iter()
        .map(|group| {
            let mut object = Map::new();
            if let Some(name) = &group.name {
                object.insert("name".into(), json!(name));
            }
            object.insert("colliders".into(), json!(group.colliders));
            Value::Object(object)
        })
        .collect();
    let springs: Vec<Value> = spring_bone.springs.iter().map(encode_spring).collect();
    json!({
        "specVersion": spring_bone.spec_version,
        "colliders": colliders,
        "colliderGroups": groups,
        "springs": springs,
    })
}

// ─── Validate ─────────────────────────────────────────────────────────────────

fn validate_spring_bone(
    spring_bone: &SpringBone,
    document: &Document,
    graph: &NodeGraph,
    report: &mut IssueReport,
) {
    let node_count = document.nodes.len();
    for (index, collider) in spring_bone.colliders.iter().enumerate() {
        report.check_index(
            format!("{POINTER}/colliders/{index}/node"),
            collider.node,
            node_count,
            "node",
        );
    }
    for (group_index, group) in spring_bone.collider_groups.iter().enumerate() {
        for (index, &collider) in group.colliders.iter().enumerate() {
            report.check_index(
                format!("{POINTER}/colliderGroups/{group_index}/colliders/{index}"),
                collider,
                spring_bone.colliders.len(),
                "collider",
            );
        }
    }
    for (spring_index, spring) in spring_bone.springs.iter().enumerate() {
        let pointer = format!("{POINTER}/springs/{spring_index}");
        let joints: Vec<usize> = spring.joints.iter().map(|joint| joint.node).collect();
        check_chain(&joints, &format!("{pointer}/joints"), graph, report);
        for (index, &group) in spring.collider_groups.iter().enumerate() {
            report.check_index(
                format!("{pointer}/colliderGroups/{index}"),
                group,
                spring_bone.collider_groups.len(),
                "collider group",
            );
        }
        if let Some(center) = spring.center {
            report.check_index(format!("{pointer}/center"), center, node_count, "node");
        }
    }
}

// ─── Remap ────────────────────────────────────────────────────────────────────

fn remap_spring_bone(spring_bone: &mut SpringBone, tables: &RemapTables) {
    let kept: Vec<bool> = spring_bone
        .colliders
        .iter()
        .map(|collider| tables.nodes.get(collider.node).is_some())
        .collect();
    let colliders = IndexMap::from_marks(&kept);
    spring_bone.colliders = colliders.retain(std::mem::take(&mut spring_bone.colliders));
    for collider in &mut spring_bone.colliders {
        if let Some(node) = tables.nodes.get(collider.node) {
            collider.node = node;
        }
    }

    for group in &mut spring_bone.collider_groups {
        group.colliders = group
            .colliders
            .iter()
            .filter_map(|collider| colliders.get(*collider))
            .collect();
    }

    for spring in &mut spring_bone.springs {
        // A chain stays connected only up to its first dropped joint.
        let kept = spring
            .joints
            .iter()
            .take_while(|joint| tables.nodes.get(joint.node).is_some())
            .count();
        spring.joints.truncate(kept);
        for joint in &mut spring.joints {
            if let Some(node) = tables.nodes.get(joint.node) {
                joint.node = node;
            }
        }
        spring.center = spring.center.and_then(|node| tables.nodes.get(node));
    }
    let before = spring_bone.springs.len();
    spring_bone.springs.retain(|spring| !spring.joints.is_empty());
    if spring_bone.springs.len() != before {
        log_debug!(
            "dropped {} spring(s) with no exported joints",
            before - spring_bone.springs.len()
        );
    }
}

impl ExtensionSchema for SpringBoneSchema {
    fn generation(&self) -> SpecGeneration {
        SpecGeneration::Vrm1
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn scope(&self) -> SchemaScope {
        SchemaScope::Root
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
        vrm.spring_bone = Some(decode_spring_bone(reader)?);
        Ok(())
    }

    fn encode(&self, document: &Document, target: SchemaTarget) -> Result<Option<Value>> {
        let spring_bone = document.vrm1().and_then(|vrm| vrm.spring_bone.as_ref());
        match (target, spring_bone) {
            (SchemaTarget::Root, Some(spring_bone)) => Ok(Some(encode_spring_bone(spring_bone))),
            _ => Ok(None),
        }
    }

    fn validate(&self, document: &Document, graph: &NodeGraph, report: &mut IssueReport) {
        if let Some(spring_bone) = document.vrm1().and_then(|vrm| vrm.spring_bone.as_ref()) {
            validate_spring_bone(spring_bone, document, graph, report);
        }
    }

    fn remap(&self, document: &mut Document, tables: &RemapTables) -> Result<()> {
        if let Some(spring_bone) = document.vrm1_mut().and_then(|vrm| vrm.spring_bone.as_mut()) {
            remap_spring_bone(spring_bone, tables);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Node, VrmExtension};
    use crate::validate::IssueKind;

    fn document_with(value: &Value, nodes: Vec<Node>) -> Result<Document> {
        let mut document = Document {
            nodes,
            vrm: Some(VrmExtension::empty(SpecGeneration::Vrm1)),
            ..Default::default()
        };
        let reader = ObjectReader::new(value, POINTER)?;
        SpringBoneSchema.decode(reader, SchemaTarget::Root, &mut document)?;
        Ok(document)
    }

    fn hair_nodes() -> Vec<Node> {
        // 0 -> 1 -> 2
        vec![
            Node {
                children: vec![1],
                ..Default::default()
            },
            Node {
                children: vec![2],
                ..Default::default()
            },
            Node::default(),
        ]
    }

    fn block(joints: &[usize]) -> Value {
        let joints: Vec<Value> = joints.iter().map(|node| json!({ "node": node })).collect();
        json!({
            "specVersion": "1.0",
            "colliders": [{
                "node": 0,
                "shape": { "capsule": { "offset": [0, 0, 0], "radius": 0.1, "tail": [0, 0.2, 0] } }
            }],
            "colliderGroups": [{ "name": "head", "colliders": [0] }],
            "springs": [{ "name": "hair", "joints": joints, "colliderGroups": [0] }]
        })
    }

    #[test]
    fn given_joint_without_parameters_when_decoding_then_defaults_apply() {
        let document = document_with(&block(&[0, 1, 2]), hair_nodes()).expect("decodes");
        let spring_bone = document
            .vrm1()
            .and_then(|vrm| vrm.spring_bone.clone())
            .unwrap_or_default();

        assert_eq!(spring_bone.springs[0].joints[1], SpringJoint::new(1));
        assert!(matches!(spring_bone.colliders[0].shape, ColliderShape::Capsule { .. }));
    }

    #[test]
    fn given_shape_without_kind_when_decoding_then_schema_violation_is_returned() {
        let value = json!({ "colliders": [{ "node": 0, "shape": {} }] });
        let err = document_with(&value, hair_nodes()).expect_err("shape needs a kind");
        assert!(matches!(
            err,
            VrmError::SchemaViolation { ref path, .. }
                if path == "/extensions/VRMC_springBone/colliders/0/shape"
        ));
    }

    #[test]
    fn given_reversed_joints_when_validating_then_chain_is_rejected() {
        let document = document_with(&block(&[2, 1]), hair_nodes()).expect("decodes");
        let graph = NodeGraph::build(&document.nodes);
        let mut report = IssueReport::new();

        SpringBoneSchema.validate(&document, &graph, &mut report);

        assert_eq!(report.count(IssueKind::InvalidSpringBoneChain), 1);
        assert_eq!(
            report.issues()[0].pointer,
            "/extensions/VRMC_springBone/springs/0/joints/1/node"
        );
    }

    #[test]
    fn given_decoded_block_when_encoding_then_decoding_again_is_identical() {
        let document = document_with(&block(&[0, 1, 2]), hair_nodes()).expect("decodes");
        let encoded = SpringBoneSchema
            .encode(&document, SchemaTarget::Root)
            .expect("encodes")
            .unwrap_or_default();

        let again = document_with(&encoded, hair_nodes()).expect("re-decodes");
        assert_eq!(again.vrm1(), document.vrm1());
    }

    #[test]
    fn given_middle_joint_dropped_when_remapping_then_chain_is_truncated() {
        let mut document = document_with(&block(&[0, 1, 2]), hair_nodes()).expect("decodes");
        let tables = RemapTables {
            nodes: IndexMap::from_marks(&[true, false, true]),
            ..Default::default()
        };

        SpringBoneSchema.remap(&mut document, &tables).expect("remaps");

        let spring_bone = document
            .vrm1()
            .and_then(|vrm| vrm.spring_bone.clone())
            .unwrap_or_default();
        assert_eq!(spring_bone.springs[0].joints.len(), 1);
        assert_eq!(spring_bone.colliders.len(), 1);
        assert_eq!(spring_bone.collider_groups[0].colliders, vec![0]);
    }
}
