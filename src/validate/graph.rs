use crate::document::Node;

/// Child→parent view of the node hierarchy, built once per validation pass.
///
/// Out-of-range child indices are left out; they are reported separately.
#[derive(Debug, Clone, Default)]
pub struct NodeGraph {
    parents: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    overrides: Vec<(usize, usize)>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

impl NodeGraph {
    pub fn build(nodes: &[Node]) -> Self {
        let mut parents = vec![None; nodes.len()];
        let mut children = vec![Vec::new(); nodes.len()];
        let mut overrides = Vec::new();

        for (parent, node) in nodes.iter().enumerate() {
            for &child in &node.children {
                if child >= nodes.len() {
                    continue;
                }
                children[parent].push(child);
                match parents[child] {
                    None => parents[child] = Some(parent),
                    Some(_) => overrides.push((child, parent)),
                }
            }
        }

        Self {
            parents,
            children,
            overrides,
        }
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn parent(&self, node: usize) -> Option<usize> {
        self.parents.get(node).copied().flatten()
    }

    pub fn children(&self, node: usize) -> &[usize] {
        self.children.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Nodes listed as a child by more than one parent, with the extra parent.
    pub fn parent_overrides(&self) -> &[(usize, usize)] {
        &self.overrides
    }

    /// Whether `ancestor` lies strictly above `descendant`. The walk is
    /// bounded by the node count, so a cyclic parent chain terminates.
    pub fn is_ancestor(&self, ancestor: usize, descendant: usize) -> bool {
        let mut current = self.parent(descendant);
        for _ in 0..self.len() {
            match current {
                Some(node) if node == ancestor => return true,
                Some(node) => current = self.parent(node),
                None => return false,
            }
        }
        false
    }

    /// `root` followed by every node reachable through child lists, each once.
    pub fn subtree(&self, root: usize) -> Vec<usize> {
        if root >= self.len() {
            return Vec::new();
        }
        let mut seen = vec![false; self.len()];
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if std::mem::replace(&mut seen[node], true) {
                continue;
            }
            order.push(node);
            stack.extend(self.children(node).iter().rev());
        }
        order
    }

    /// Depth-first search from `starts` (then from every remaining node),
    /// returning each edge that closes a cycle as `(parent, child)`.
    pub fn find_cycles(&self, starts: &[usize]) -> Vec<(usize, usize)> {
        let mut marks = vec![Mark::Unvisited; self.len()];
        let mut back_edges = Vec::new();

        let all = 0..self.len();
        for start in starts.iter().copied().chain(all) {
            if start >= self.len() || marks[start] != Mark::Unvisited {
                continue;
            }

            let mut stack = vec![(start, 0usize)];
            marks[start] = Mark::OnPath;
            while let Some((node, next)) = stack.last_mut() {
                let node = *node;
                let Some(&child) = self.children(node).get(*next) else {
                    marks[node] = Mark::Done;
                    stack.pop();
                    continue;
                };
                *next += 1;

                match marks[child] {
                    Mark::Unvisited => {
                        marks[child] = Mark::OnPath;
                        stack.push((child, 0));
                    }
                    Mark::OnPath => back_edges.push((node, child)),
                    Mark::Done => {}
                }
            }
        }

        back_edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(children: &[&[usize]]) -> Vec<Node> {
        children
            .iter()
            .map(|children| Node {
                children: children.to_vec(),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn given_two_node_cycle_when_searching_then_one_back_edge_is_found() {
        let graph = NodeGraph::build(&nodes(&[&[1], &[0]]));

        assert_eq!(graph.find_cycles(&[]), vec![(1, 0)]);
        assert!(!graph.is_ancestor(5, 0));
    }

    #[test]
    fn given_self_loop_when_searching_then_it_is_reported() {
        let graph = NodeGraph::build(&nodes(&[&[0]]));
        assert_eq!(graph.find_cycles(&[0]), vec![(0, 0)]);
    }

    #[test]
    fn given_shared_child_when_building_then_parent_override_is_recorded() {
        let graph = NodeGraph::build(&nodes(&[&[2], &[2], &[]]));

        assert_eq!(graph.parent(2), Some(0));
        assert_eq!(graph.parent_overrides(), &[(2, 1)]);
        assert!(graph.find_cycles(&[0, 1]).is_empty());
    }

    #[test]
    fn given_chain_when_querying_ancestry_then_only_strict_ancestors_match() {
        let graph = NodeGraph::build(&nodes(&[&[1], &[2], &[], &[]]));

        assert!(graph.is_ancestor(0, 2));
        assert!(!graph.is_ancestor(2, 2));
        assert!(!graph.is_ancestor(3, 2));
        assert_eq!(graph.subtree(0), vec![0, 1, 2]);
    }
}
