//! 0.x secondary animation and 1.0 spring bones.
//!
//! A 0.x bone group simulates every descendant of each listed root; a 1.0
//! spring is an explicit joint chain. Roots are expanded by following first
//! children, and chains collapse back to their first joint.

use crate::document::Document;
use crate::validate::IssueReport;
use crate::vrm::vrm0::{Vrm0BoneGroup, Vrm0Collider, Vrm0ColliderGroup, Vrm0SecondaryAnimation};
use crate::vrm::vrm1::{Collider, ColliderGroup, ColliderShape, Spring, SpringBone, SpringJoint};

use super::migration_loss;
use super::view::mirror_x;

const VRM0_POINTER: &str = "/extensions/VRM/secondaryAnimation";
const VRM1_POINTER: &str = "/extensions/VRMC_springBone";

fn joint(node: usize, group: &Vrm0BoneGroup) -> SpringJoint {
    SpringJoint {
        hit_radius: group.hit_radius,
        stiffness: group.stiffness,
        gravity_power: group.gravity_power,
        gravity_dir: group.gravity_dir,
        drag_force: group.drag_force,
        ..SpringJoint::new(node)
    }
}

/// Chain from `root` down through first children. Bounded by the node count
/// so a cyclic graph cannot loop forever.
fn first_child_chain(
    root: usize,
    group: &Vrm0BoneGroup,
    document: &Document,
    pointer: &str,
    report: &mut IssueReport,
) -> Vec<SpringJoint> {
    let mut joints = Vec::new();
    let mut current = Some(root);
    while let Some(node) = current {
        let Some(entry) = document.nodes.get(node) else {
            break;
        };
        if joints.len() >= document.nodes.len() {
            break;
        }
        joints.push(joint(node, group));
        if entry.children.len() > 1 {
            migration_loss(
                report,
                pointer,
                format!("node {node} branches; only its first child is simulated"),
            );
        }
        current = entry.children.first().copied();
    }
    joints
}

pub(super) fn spring_bone_from_vrm0(
    source: &Vrm0SecondaryAnimation,
    document: &Document,
    report: &mut IssueReport,
) -> SpringBone {
    let mut spring_bone = SpringBone::default();

    for group in &source.collider_groups {
        let mut members = Vec::with_capacity(group.colliders.len());
        for collider in &group.colliders {
            members.push(spring_bone.colliders.len());
            spring_bone.colliders.push(Collider {
                node: group.node,
                shape: ColliderShape::Sphere {
                    offset: mirror_x(collider.offset),
                    radius: collider.radius,
                },
            });
        }
        spring_bone.collider_groups.push(ColliderGroup {
            name: None,
            colliders: members,
        });
    }

    for (group_index, group) in source.bone_groups.iter().enumerate() {
        for (slot, &root) in group.bones.iter().enumerate() {
            let pointer = format!("{VRM0_POINTER}/boneGroups/{group_index}/bones/{slot}");
            let joints = first_child_chain(root, group, document, &pointer, report);
            if joints.is_empty() {
                migration_loss(report, pointer, format!("bone {root} does not exist"));
                continue;
            }
            spring_bone.springs.push(Spring {
                name: group.comment.clone(),
                joints,
                collider_groups: group.collider_groups.clone(),
                center: group.center,
            });
        }
    }
    spring_bone
}

fn same_parameters(a: &SpringJoint, b: &SpringJoint) -> bool {
    a.hit_radius == b.hit_radius
        && a.stiffness == b.stiffness
        && a.gravity_power == b.gravity_power
        && a.gravity_dir == b.gravity_dir
        && a.drag_force == b.drag_force
}

fn collider_group_to_vrm0(
    group: &ColliderGroup,
    group_index: usize,
    colliders: &[Collider],
    report: &mut IssueReport,
) -> Option<Vrm0ColliderGroup> {
    let members: Vec<(usize, &Collider)> = group
        .colliders
        .iter()
        .filter_map(|&index| colliders.get(index).map(|collider| (index, collider)))
        .collect();
    let node = members.first()?.1.node;

    let mut out = Vec::with_capacity(members.len());
    for (index, collider) in members {
        let pointer = format!("{VRM1_POINTER}/colliders/{index}");
        if collider.node != node {
            migration_loss(
                report,
                pointer,
                format!(
                    "collider group {group_index} spans several nodes; only node {node} is kept"
                ),
            );
            continue;
        }
        let (offset, radius) = match collider.shape {
            ColliderShape::Sphere { offset, radius } => (offset, radius),
            ColliderShape::Capsule { offset, radius, .. } => {
                migration_loss(report, pointer, "capsule collider is reduced to its head sphere");
                (offset, radius)
            }
        };
        out.push(Vrm0Collider {
            offset: mirror_x(offset),
            radius,
        });
    }
    Some(Vrm0ColliderGroup {
        node,
        colliders: out,
    })
}

pub(super) fn spring_bone_to_vrm0(
    spring_bone: &SpringBone,
    report: &mut IssueReport,
) -> Vrm0SecondaryAnimation {
    let mut collider_groups = Vec::new();
    let mut group_map = Vec::with_capacity(spring_bone.collider_groups.len());
    for (index, group) in spring_bone.collider_groups.iter().enumerate() {
        match collider_group_to_vrm0(group, index, &spring_bone.colliders, report) {
            Some(group) => {
                group_map.push(Some(collider_groups.len()));
                collider_groups.push(group);
            }
            None => group_map.push(None),
        }
    }

    let mut bone_groups = Vec::new();
    for (index, spring) in spring_bone.springs.iter().enumerate() {
        let Some(first) = spring.joints.first() else {
            continue;
        };
        if spring.joints.iter().any(|joint| !same_parameters(joint, first)) {
            migration_loss(
                report,
                format!("{VRM1_POINTER}/springs/{index}/joints"),
                "per-joint parameters are replaced by the first joint's",
            );
        }
        bone_groups.push(Vrm0BoneGroup {
            comment: spring.name.clone(),
            stiffness: first.stiffness,
            gravity_power: first.gravity_power,
            gravity_dir: first.gravity_dir,
            drag_force: first.drag_force,
            center: spring.center,
            hit_radius: first.hit_radius,
            bones: vec![first.node],
            collider_groups: spring
                .collider_groups
                .iter()
                .filter_map(|&group| group_map.get(group).copied().flatten())
                .collect(),
        });
    }

    Vrm0SecondaryAnimation {
        bone_groups,
        collider_groups,
    }
}
