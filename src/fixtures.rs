//! Small but complete humanoid used across unit tests.
//!
//! ```text
//! 0 root ─┬─ 1 hips ─┬─ 2 spine ─ 3 chest ─┬─ 4 neck ─ 5 head ─ 19 hair_root ─ 20 hair_tip
//!         │          │                     ├─ 6 ─ 7 ─ 8    (left arm)
//!         │          │                     └─ 9 ─ 10 ─ 11  (right arm)
//!         │          ├─ 12 ─ 13 ─ 14                       (left leg)
//!         │          └─ 15 ─ 16 ─ 17                       (right leg)
//!         └─ 18 body (mesh 0)
//! ```

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::document::{
    Accessor, Buffer, BufferView, ComponentType, Document, ElementType, Material, Mesh, Node,
    Primitive, Scene, Transform, VrmExtension,
};
use crate::vrm::mtoon::MToon;
use crate::vrm::vrm0::{
    SHADER_MTOON, Vrm0, Vrm0BlendShapeBind, Vrm0BlendShapeGroup, Vrm0BoneGroup, Vrm0Collider,
    Vrm0ColliderGroup, Vrm0FirstPerson, Vrm0HumanBone, Vrm0Humanoid, Vrm0MaterialProperties,
    Vrm0MeshAnnotation, Vrm0Meta, Vrm0SecondaryAnimation,
};
use crate::vrm::vrm1::{
    Collider, ColliderGroup, ColliderShape, Expression, ExpressionPreset, Expressions,
    FirstPersonAnnotation, FirstPersonType, LookAt, Meta, MorphTargetBind, Spring, SpringBone,
    SpringJoint, Vrm1,
};
use crate::vrm::{ConstraintKind, HumanBone, NodeConstraint};

pub const HIPS: usize = 1;
pub const SPINE: usize = 2;
pub const HEAD: usize = 5;
pub const BODY_NODE: usize = 18;
pub const HAIR_ROOT: usize = 19;
pub const HAIR_TIP: usize = 20;

const BONES: [(HumanBone, usize); 17] = [
    (HumanBone::Hips, HIPS),
    (HumanBone::Spine, SPINE),
    (HumanBone::Chest, 3),
    (HumanBone::Neck, 4),
    (HumanBone::Head, HEAD),
    (HumanBone::LeftUpperArm, 6),
    (HumanBone::LeftLowerArm, 7),
    (HumanBone::LeftHand, 8),
    (HumanBone::RightUpperArm, 9),
    (HumanBone::RightLowerArm, 10),
    (HumanBone::RightHand, 11),
    (HumanBone::LeftUpperLeg, 12),
    (HumanBone::LeftLowerLeg, 13),
    (HumanBone::LeftFoot, 14),
    (HumanBone::RightUpperLeg, 15),
    (HumanBone::RightLowerLeg, 16),
    (HumanBone::RightFoot, 17),
];

fn named(name: &str, children: Vec<usize>) -> Node {
    Node {
        name: Some(name.to_string()),
        children,
        ..Default::default()
    }
}

fn skeleton() -> Vec<Node> {
    let mut nodes = vec![
        named("root", vec![HIPS, BODY_NODE]),
        named("hips", vec![SPINE, 12, 15]),
        named("spine", vec![3]),
        named("chest", vec![4, 6, 9]),
        named("neck", vec![HEAD]),
        named("head", vec![HAIR_ROOT]),
        named("upper_arm_l", vec![7]),
        named("lower_arm_l", vec![8]),
        named("hand_l", Vec::new()),
        named("upper_arm_r", vec![10]),
        named("lower_arm_r", vec![11]),
        named("hand_r", Vec::new()),
        named("upper_leg_l", vec![13]),
        named("lower_leg_l", vec![14]),
        named("foot_l", Vec::new()),
        named("upper_leg_r", vec![16]),
        named("lower_leg_r", vec![17]),
        named("foot_r", Vec::new()),
        named("body", Vec::new()),
        named("hair_root", vec![HAIR_TIP]),
        named("hair_tip", Vec::new()),
    ];
    nodes[HIPS].transform = Transform::Trs {
        translation: [0.0, 1.0, 0.0],
        rotation: [0.0, 0.0, 0.0, 1.0],
        scale: [1.0; 3],
    };
    nodes[BODY_NODE].mesh = Some(0);
    nodes
}

/// Three little-endian f32 vec3s, three u16 indices (+2 bytes of padding),
/// then three more vec3s for the morph target: 80 bytes.
fn binary() -> Vec<u8> {
    let mut bin = Vec::with_capacity(80);
    for value in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
        bin.extend_from_slice(&value.to_le_bytes());
    }
    for index in [0u16, 1, 2] {
        bin.extend_from_slice(&index.to_le_bytes());
    }
    bin.extend_from_slice(&[0, 0]);
    for value in [0.0f32, 0.0, 0.1, 0.0, 0.0, 0.1, 0.0, 0.0, 0.1] {
        bin.extend_from_slice(&value.to_le_bytes());
    }
    bin
}

fn vec3_accessor(view: usize, min: [f64; 3], max: [f64; 3]) -> Accessor {
    Accessor {
        buffer_view: Some(view),
        min: min.to_vec(),
        max: max.to_vec(),
        ..Accessor::new(ComponentType::F32, ElementType::Vec3, 3)
    }
}

fn view(byte_offset: usize, byte_length: usize, target: u32) -> BufferView {
    BufferView {
        byte_offset,
        byte_length,
        target: Some(target),
        ..Default::default()
    }
}

/// Skeleton, one triangle with a morph target, one material. No VRM block.
pub fn plain_document() -> Document {
    let bin = binary();
    Document {
        scene: Some(0),
        scenes: vec![Scene {
            nodes: vec![0],
            ..Default::default()
        }],
        nodes: skeleton(),
        meshes: vec![Mesh {
            name: Some("body".to_string()),
            primitives: vec![Primitive {
                attributes: BTreeMap::from([("POSITION".to_string(), 0)]),
                indices: Some(1),
                material: Some(0),
                targets: vec![BTreeMap::from([("POSITION".to_string(), 2)])],
                ..Default::default()
            }],
            ..Default::default()
        }],
        materials: vec![Material {
            name: Some("body".to_string()),
            ..Default::default()
        }],
        accessors: vec![
            vec3_accessor(0, [0.0; 3], [1.0, 1.0, 0.0]),
            Accessor {
                buffer_view: Some(1),
                ..Accessor::new(ComponentType::U16, ElementType::Scalar, 3)
            },
            vec3_accessor(2, [0.0, 0.0, 0.1], [0.0, 0.0, 0.1]),
        ],
        buffer_views: vec![view(0, 36, 34962), view(36, 6, 34963), view(44, 36, 34962)],
        buffers: vec![Buffer {
            byte_length: bin.len(),
            data: Some(Bytes::from(bin)),
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn vrm0_block() -> Vrm0 {
    Vrm0 {
        exporter_version: Some("fixture".to_string()),
        spec_version: Some("0.0".to_string()),
        meta: Vrm0Meta {
            title: Some("Fixture".to_string()),
            author: Some("tester".to_string()),
            allowed_user_name: Some("OnlyAuthor".to_string()),
            license_name: Some("Redistribution_Prohibited".to_string()),
            ..Default::default()
        },
        humanoid: Vrm0Humanoid {
            human_bones: BONES
                .iter()
                .map(|&(bone, node)| Vrm0HumanBone {
                    bone,
                    node,
                    use_default_values: true,
                })
                .collect(),
            ..Default::default()
        },
        first_person: Vrm0FirstPerson {
            first_person_bone: Some(HEAD),
            mesh_annotations: vec![Vrm0MeshAnnotation {
                mesh: 0,
                first_person_flag: "Auto".to_string(),
            }],
            ..Default::default()
        },
        blend_shape_master: vec![Vrm0BlendShapeGroup {
            name: "Blink".to_string(),
            preset_name: "blink".to_string(),
            binds: vec![Vrm0BlendShapeBind {
                mesh: 0,
                index: 0,
                weight: 100.0,
            }],
            material_values: Vec::new(),
            is_binary: false,
        }],
        secondary_animation: Vrm0SecondaryAnimation {
            bone_groups: vec![Vrm0BoneGroup {
                comment: Some("hair".to_string()),
                bones: vec![HAIR_ROOT],
                collider_groups: vec![0],
                ..Default::default()
            }],
            collider_groups: vec![Vrm0ColliderGroup {
                node: HEAD,
                colliders: vec![Vrm0Collider {
                    offset: [0.0, 0.1, 0.0],
                    radius: 0.1,
                }],
            }],
        },
        material_properties: vec![Vrm0MaterialProperties {
            name: "body".to_string(),
            shader: SHADER_MTOON.to_string(),
            render_queue: 2000,
            float_properties: BTreeMap::from([
                ("_ShadeShift".to_string(), 0.0),
                ("_ShadeToony".to_string(), 0.9),
            ]),
            vector_properties: BTreeMap::from([(
                "_ShadeColor".to_string(),
                vec![0.5, 0.5, 0.5, 1.0],
            )]),
            ..Default::default()
        }],
    }
}

/// [`plain_document`] with a 0.x `VRM` block.
pub fn vrm0_document() -> Document {
    Document {
        extensions_used: vec!["VRM".to_string()],
        vrm: Some(VrmExtension::Vrm0(Box::new(vrm0_block()))),
        ..plain_document()
    }
}

fn vrm1_block() -> Vrm1 {
    Vrm1 {
        meta: Meta {
            name: "Fixture".to_string(),
            authors: vec!["tester".to_string()],
            ..Default::default()
        },
        humanoid: BONES.into_iter().collect(),
        first_person: vec![FirstPersonAnnotation {
            node: BODY_NODE,
            kind: FirstPersonType::Auto,
        }],
        look_at: Some(LookAt::default()),
        expressions: Expressions {
            preset: BTreeMap::from([(
                ExpressionPreset::Blink,
                Expression {
                    morph_target_binds: vec![MorphTargetBind {
                        node: BODY_NODE,
                        index: 0,
                        weight: 1.0,
                    }],
                    ..Default::default()
                },
            )]),
            custom: BTreeMap::from([(
                "smug".to_string(),
                Expression {
                    is_binary: true,
                    ..Default::default()
                },
            )]),
        },
        spring_bone: Some(SpringBone {
            colliders: vec![Collider {
                node: HEAD,
                shape: ColliderShape::Sphere {
                    offset: [0.0, 0.1, 0.0],
                    radius: 0.1,
                },
            }],
            collider_groups: vec![ColliderGroup {
                name: Some("head".to_string()),
                colliders: vec![0],
            }],
            springs: vec![Spring {
                name: Some("hair".to_string()),
                joints: vec![SpringJoint::new(HAIR_ROOT), SpringJoint::new(HAIR_TIP)],
                collider_groups: vec![0],
                center: None,
            }],
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// [`plain_document`] with `VRMC_vrm`, spring bones, an MToon material and a
/// rotation constraint on the hair root.
pub fn vrm1_document() -> Document {
    let mut document = plain_document();
    document.extensions_used = vec![
        "VRMC_materials_mtoon".to_string(),
        "VRMC_node_constraint".to_string(),
        "VRMC_springBone".to_string(),
        "VRMC_vrm".to_string(),
    ];
    document.materials[0].mtoon = Some(MToon::default());
    document.nodes[HAIR_ROOT].constraint = Some(NodeConstraint {
        spec_version: "1.0".to_string(),
        kind: ConstraintKind::Rotation {
            source: HEAD,
            weight: 0.5,
        },
    });
    document.vrm = Some(VrmExtension::Vrm1(Box::new(vrm1_block())));
    document
}
