//! First-person annotations and look-at between the 0.x `firstPerson` block
//! and the 1.0 `firstPerson`/`lookAt` pair.
//!
//! 0.x offsets are authored with the model facing -Z, so their X axis is
//! mirrored relative to 1.0.

use std::collections::BTreeMap;

use crate::document::Document;
use crate::validate::IssueReport;
use crate::vrm::HumanBone;
use crate::vrm::vrm0::{Vrm0DegreeMap, Vrm0FirstPerson, Vrm0MeshAnnotation};
use crate::vrm::vrm1::{FirstPersonAnnotation, FirstPersonType, LookAt, LookAtType, RangeMap};

use super::migration_loss;

const POINTER: &str = "/extensions/VRM/firstPerson";

pub(super) fn mirror_x(offset: [f32; 3]) -> [f32; 3] {
    [-offset[0], offset[1], offset[2]]
}

pub(super) fn first_person_from_vrm0(
    source: &Vrm0FirstPerson,
    document: &Document,
    report: &mut IssueReport,
) -> Vec<FirstPersonAnnotation> {
    let mut annotations = Vec::new();
    for (index, annotation) in source.mesh_annotations.iter().enumerate() {
        match document.first_node_with_mesh(annotation.mesh) {
            Some(node) => annotations.push(FirstPersonAnnotation {
                node,
                kind: FirstPersonType::from_vrm0_flag(&annotation.first_person_flag),
            }),
            None => migration_loss(
                report,
                format!("{POINTER}/meshAnnotations/{index}/mesh"),
                format!("no node instantiates mesh {}", annotation.mesh),
            ),
        }
    }
    annotations
}

fn range_map(degree_map: &Vrm0DegreeMap, pointer: &str, report: &mut IssueReport) -> RangeMap {
    if degree_map.curve != Vrm0DegreeMap::default().curve {
        migration_loss(
            report,
            format!("{pointer}/curve"),
            "non-linear look-at curve is approximated linearly",
        );
    }
    RangeMap {
        input_max_value: degree_map.x_range,
        output_scale: degree_map.y_range,
    }
}

pub(super) fn look_at_from_vrm0(
    source: &Vrm0FirstPerson,
    humanoid: &BTreeMap<HumanBone, usize>,
    report: &mut IssueReport,
) -> LookAt {
    let head = humanoid.get(&HumanBone::Head).copied();
    if source.first_person_bone.is_some() && source.first_person_bone != head {
        migration_loss(
            report,
            format!("{POINTER}/firstPersonBone"),
            "first-person bone is not the head; offset is applied to the head",
        );
    }

    LookAt {
        offset_from_head_bone: mirror_x(source.first_person_bone_offset),
        kind: if source.look_at_type_name == "BlendShape" {
            LookAtType::Expression
        } else {
            LookAtType::Bone
        },
        range_map_horizontal_inner: range_map(
            &source.look_at_horizontal_inner,
            &format!("{POINTER}/lookAtHorizontalInner"),
            report,
        ),
        range_map_horizontal_outer: range_map(
            &source.look_at_horizontal_outer,
            &format!("{POINTER}/lookAtHorizontalOuter"),
            report,
        ),
        range_map_vertical_down: range_map(
            &source.look_at_vertical_down,
            &format!("{POINTER}/lookAtVerticalDown"),
            report,
        ),
        range_map_vertical_up: range_map(
            &source.look_at_vertical_up,
            &format!("{POINTER}/lookAtVerticalUp"),
            report,
        ),
    }
}

fn degree_map(range: &RangeMap) -> Vrm0DegreeMap {
    Vrm0DegreeMap {
        x_range: range.input_max_value,
        y_range: range.output_scale,
        ..Default::default()
    }
}

pub(super) fn first_person_to_vrm0(
    annotations: &[FirstPersonAnnotation],
    look_at: &LookAt,
    humanoid: &BTreeMap<HumanBone, usize>,
    document: &Document,
    report: &mut IssueReport,
) -> Vrm0FirstPerson {
    let mut mesh_annotations = Vec::new();
    for (index, annotation) in annotations.iter().enumerate() {
        match document.nodes.get(annotation.node).and_then(|node| node.mesh) {
            Some(mesh) => mesh_annotations.push(Vrm0MeshAnnotation {
                mesh,
                first_person_flag: annotation.kind.vrm0_flag().to_string(),
            }),
            None => migration_loss(
                report,
                format!("/extensions/VRMC_vrm/firstPerson/meshAnnotations/{index}/node"),
                format!("node {} has no mesh to annotate", annotation.node),
            ),
        }
    }

    Vrm0FirstPerson {
        first_person_bone: humanoid.get(&HumanBone::Head).copied(),
        first_person_bone_offset: mirror_x(look_at.offset_from_head_bone),
        mesh_annotations,
        look_at_type_name: match look_at.kind {
            LookAtType::Bone => "Bone",
            LookAtType::Expression => "BlendShape",
        }
        .to_string(),
        look_at_horizontal_inner: degree_map(&look_at.range_map_horizontal_inner),
        look_at_horizontal_outer: degree_map(&look_at.range_map_horizontal_outer),
        look_at_vertical_down: degree_map(&look_at.range_map_vertical_down),
        look_at_vertical_up: degree_map(&look_at.range_map_vertical_up),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::IssueKind;

    #[test]
    fn given_vrm0_offset_when_migrating_then_x_is_mirrored_and_ranges_carry_over() {
        let source = Vrm0FirstPerson {
            first_person_bone: Some(5),
            first_person_bone_offset: [0.01, 0.06, 0.02],
            look_at_type_name: "BlendShape".to_string(),
            look_at_vertical_up: Vrm0DegreeMap {
                x_range: 45.0,
                y_range: 1.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let humanoid = BTreeMap::from([(HumanBone::Head, 5)]);
        let mut report = IssueReport::new();

        let look_at = look_at_from_vrm0(&source, &humanoid, &mut report);

        assert_eq!(look_at.offset_from_head_bone, [-0.01, 0.06, 0.02]);
        assert_eq!(look_at.kind, LookAtType::Expression);
        assert_eq!(look_at.range_map_vertical_up.input_max_value, 45.0);
        assert_eq!(look_at.range_map_vertical_up.output_scale, 1.0);
        assert!(report.is_empty());
    }

    #[test]
    fn given_curved_degree_map_when_migrating_then_loss_is_reported() {
        let source = Vrm0FirstPerson {
            look_at_horizontal_outer: Vrm0DegreeMap {
                curve: vec![0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0, 0.0],
                ..Default::default()
            },
            ..Default::default()
        };
        let mut report = IssueReport::new();

        look_at_from_vrm0(&source, &BTreeMap::new(), &mut report);

        assert_eq!(report.count(IssueKind::MigrationLoss), 1);
        assert!(report.issues()[0].pointer.ends_with("lookAtHorizontalOuter/curve"));
    }
}
