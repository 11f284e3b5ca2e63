use super::{IssueKind, IssueReport, NodeGraph};

/// A spring chain must name existing, distinct nodes, each one strictly
/// below the previous in the node hierarchy.
pub(crate) fn check_chain(
    joints: &[usize],
    pointer: &str,
    graph: &NodeGraph,
    report: &mut IssueReport,
) {
    if joints.is_empty() {
        report.push(IssueKind::InvalidSpringBoneChain, pointer, "spring has no joints");
        return;
    }

    let mut resolved = true;
    for (index, &node) in joints.iter().enumerate() {
        if node >= graph.len() {
            report.check_index(format!("{pointer}/{index}/node"), node, graph.len(), "node");
            resolved = false;
        }
    }
    if !resolved {
        return;
    }

    for (index, pair) in joints.windows(2).enumerate() {
        let (parent, child) = (pair[0], pair[1]);
        if !graph.is_ancestor(parent, child) {
            report.push(
                IssueKind::InvalidSpringBoneChain,
                format!("{pointer}/{}/node", index + 1),
                format!(
                    "joint node {child} is not a descendant of the previous joint node {parent}"
                ),
            );
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Node;

    fn graph() -> NodeGraph {
        // 0 -> 1 -> 2, 0 -> 3
        let nodes = vec![
            Node {
                children: vec![1, 3],
                ..Default::default()
            },
            Node {
                children: vec![2],
                ..Default::default()
            },
            Node::default(),
            Node::default(),
        ];
        NodeGraph::build(&nodes)
    }

    #[test]
    fn given_ordered_chain_when_checking_then_no_issue_is_reported() {
        let mut report = IssueReport::new();
        check_chain(&[0, 1, 2], "/springs/0/joints", &graph(), &mut report);
        assert!(report.is_empty());
    }

    #[test]
    fn given_reversed_chain_when_checking_then_chain_is_invalid() {
        let mut report = IssueReport::new();
        check_chain(&[2, 1], "/springs/0/joints", &graph(), &mut report);
        assert_eq!(report.count(IssueKind::InvalidSpringBoneChain), 1);
    }

    #[test]
    fn given_sibling_branch_when_checking_then_disconnected_chain_is_invalid() {
        let mut report = IssueReport::new();
        check_chain(&[1, 3], "/springs/0/joints", &graph(), &mut report);
        assert_eq!(report.issues()[0].pointer, "/springs/0/joints/1/node");
    }
}
