//! Humanoid checks shared by both generations: bounds, duplicate roles,
//! required bones and the bone hierarchy.

use std::collections::BTreeMap;

use crate::document::SpecGeneration;
use crate::vrm::HumanBone;
use crate::vrm::humanoid::required_bones;

use super::{IssueKind, IssueReport, NodeGraph};

/// One bone → node assignment with the pointer of its `node` field.
#[derive(Debug, Clone)]
pub(crate) struct BoneAssignment {
    pub bone: HumanBone,
    pub node: usize,
    pub pointer: String,
}

pub(crate) fn check_humanoid(
    assignments: &[BoneAssignment],
    generation: SpecGeneration,
    humanoid_pointer: &str,
    graph: &NodeGraph,
    report: &mut IssueReport,
) {
    let mut in_range = Vec::with_capacity(assignments.len());
    for assignment in assignments {
        if assignment.node < graph.len() {
            in_range.push(assignment);
        } else {
            report.check_index(&assignment.pointer, assignment.node, graph.len(), "node");
        }
    }

    // A role listed twice keeps only its last node; the earlier entry is lost.
    let mut seen: BTreeMap<HumanBone, &BoneAssignment> = BTreeMap::new();
    for assignment in assignments {
        if let Some(previous) = seen.insert(assignment.bone, assignment) {
            report.push(
                IssueKind::DuplicateBoneAssignment,
                &assignment.pointer,
                format!(
                    "bone '{}' is assigned more than once (nodes {} and {})",
                    assignment.bone.as_str(),
                    previous.node,
                    assignment.node
                ),
            );
        }
    }

    // One issue per shared node, naming every role assigned to it.
    let mut by_node: BTreeMap<usize, Vec<&BoneAssignment>> = BTreeMap::new();
    for assignment in in_range.iter().copied() {
        by_node.entry(assignment.node).or_default().push(assignment);
    }
    for (node, shared) in &by_node {
        let mut roles: Vec<&str> =
            shared.iter().map(|assignment| assignment.bone.as_str()).collect();
        roles.sort_unstable();
        roles.dedup();
        if roles.len() < 2 {
            continue;
        }
        let pointer = shared
            .last()
            .map(|assignment| assignment.pointer.clone())
            .unwrap_or_default();
        report.push(
            IssueKind::DuplicateBoneAssignment,
            pointer,
            format!("node {node} is assigned to more than one bone: {}", roles.join(", ")),
        );
    }

    let assigned: BTreeMap<HumanBone, &BoneAssignment> = assignments
        .iter()
        .map(|assignment| (assignment.bone, assignment))
        .collect();

    for bone in required_bones(generation) {
        if !assigned.contains_key(bone) {
            report.push(
                IssueKind::MissingRequiredBone,
                humanoid_pointer,
                format!("required bone '{}' is not assigned", bone.as_str()),
            );
        }
    }

    let missing_optional: Vec<&str> = HumanBone::ALL
        .iter()
        .filter(|bone| !bone.is_required(generation) && !assigned.contains_key(*bone))
        .map(|bone| bone.as_str())
        .collect();
    if !missing_optional.is_empty() {
        report.push(
            IssueKind::MissingOptionalBone,
            humanoid_pointer,
            format!(
                "{} optional bone(s) not assigned: {}",
                missing_optional.len(),
                missing_optional.join(", ")
            ),
        );
    }

    for assignment in in_range {
        let Some(ancestor) = nearest_assigned_ancestor(assignment.bone, &assigned) else {
            continue;
        };
        if ancestor.node >= graph.len() || ancestor.node == assignment.node {
            continue;
        }
        if !graph.is_ancestor(ancestor.node, assignment.node) {
            report.push(
                IssueKind::InvalidBoneHierarchy,
                &assignment.pointer,
                format!(
                    "bone '{}' (node {}) is not a descendant of '{}' (node {})",
                    assignment.bone.as_str(),
                    assignment.node,
                    ancestor.bone.as_str(),
                    ancestor.node
                ),
            );
        }
    }
}

fn nearest_assigned_ancestor<'a>(
    bone: HumanBone,
    assigned: &BTreeMap<HumanBone, &'a BoneAssignment>,
) -> Option<&'a BoneAssignment> {
    let mut current = bone.parent();
    while let Some(parent) = current {
        if let Some(assignment) = assigned.get(&parent) {
            return Some(*assignment);
        }
        current = parent.parent();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Node;

    fn chain(len: usize) -> NodeGraph {
        let nodes: Vec<Node> = (0..len)
            .map(|index| Node {
                children: if index + 1 < len { vec![index + 1] } else { Vec::new() },
                ..Default::default()
            })
            .collect();
        NodeGraph::build(&nodes)
    }

    fn assign(bone: HumanBone, node: usize) -> BoneAssignment {
        BoneAssignment {
            bone,
            node,
            pointer: format!("/humanoid/{}", bone.as_str()),
        }
    }

    #[test]
    fn given_two_roles_on_one_node_when_checking_then_single_issue_names_both() {
        let graph = chain(5);
        let mut report = IssueReport::new();

        check_humanoid(
            &[assign(HumanBone::Hips, 3), assign(HumanBone::Spine, 3)],
            SpecGeneration::Vrm0,
            "/humanoid",
            &graph,
            &mut report,
        );

        let duplicates: Vec<_> = report
            .issues()
            .iter()
            .filter(|issue| issue.code == IssueKind::DuplicateBoneAssignment)
            .collect();
        assert_eq!(duplicates.len(), 1);
        assert!(duplicates[0].message.contains("node 3"));
        assert!(duplicates[0].message.contains("hips"));
        assert!(duplicates[0].message.contains("spine"));
        assert!(!report.contains(IssueKind::InvalidBoneHierarchy));
    }

    #[test]
    fn given_role_listed_twice_when_checking_then_duplicate_role_is_reported() {
        let graph = chain(5);
        let mut report = IssueReport::new();
        let repeated = BoneAssignment {
            pointer: "/humanoid/humanBones/1/node".to_string(),
            ..assign(HumanBone::Hips, 2)
        };

        check_humanoid(
            &[assign(HumanBone::Hips, 0), repeated],
            SpecGeneration::Vrm0,
            "/humanoid",
            &graph,
            &mut report,
        );

        let duplicates: Vec<_> = report
            .issues()
            .iter()
            .filter(|issue| issue.code == IssueKind::DuplicateBoneAssignment)
            .collect();
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].pointer, "/humanoid/humanBones/1/node");
        assert!(duplicates[0].message.contains("nodes 0 and 2"));
    }

    #[test]
    fn given_role_repeated_on_same_node_when_checking_then_reported_once() {
        let graph = chain(5);
        let mut report = IssueReport::new();

        check_humanoid(
            &[assign(HumanBone::Hips, 1), assign(HumanBone::Hips, 1)],
            SpecGeneration::Vrm0,
            "/humanoid",
            &graph,
            &mut report,
        );

        assert_eq!(report.count(IssueKind::DuplicateBoneAssignment), 1);
    }

    #[test]
    fn given_distinct_nodes_when_checking_then_no_duplicate_is_reported() {
        let graph = chain(5);
        let mut report = IssueReport::new();

        check_humanoid(
            &[assign(HumanBone::Hips, 0), assign(HumanBone::Spine, 1)],
            SpecGeneration::Vrm1,
            "/humanoid",
            &graph,
            &mut report,
        );

        assert!(!report.contains(IssueKind::DuplicateBoneAssignment));
        assert!(report.contains(IssueKind::MissingRequiredBone));
        assert_eq!(report.count(IssueKind::MissingOptionalBone), 1);
    }

    #[test]
    fn given_child_bone_above_parent_when_checking_then_hierarchy_is_invalid() {
        let graph = chain(3);
        let mut report = IssueReport::new();

        check_humanoid(
            &[assign(HumanBone::Hips, 2), assign(HumanBone::Spine, 0)],
            SpecGeneration::Vrm1,
            "/humanoid",
            &graph,
            &mut report,
        );

        assert_eq!(report.count(IssueKind::InvalidBoneHierarchy), 1);
    }

    #[test]
    fn given_out_of_range_node_when_checking_then_reference_is_unresolved() {
        let graph = chain(2);
        let mut report = IssueReport::new();

        check_humanoid(
            &[assign(HumanBone::Hips, 9)],
            SpecGeneration::Vrm1,
            "/humanoid",
            &graph,
            &mut report,
        );

        assert!(report.contains(IssueKind::UnresolvedReference));
    }
}
