//! `VRMC_node_constraint`: roll, aim and rotation constraints on single nodes.

use serde_json::{Map, Value, json};

use crate::decode::reader::ObjectReader;
use crate::document::{Document, SpecGeneration};
use crate::encode::remap::RemapTables;
use crate::error::{Result, VrmError};
use crate::validate::{IssueKind, IssueReport, NodeGraph};
use crate::vrm::constraint::{AIM_AXES, ROLL_AXES};
use crate::vrm::{ConstraintKind, NodeConstraint};
use crate::log_debug;

use super::{ExtensionSchema, SchemaScope, SchemaTarget, float_value};

const NAME: &str = "VRMC_node_constraint";

pub struct NodeConstraintSchema;

fn constraint_pointer(node: usize, constraint: &NodeConstraint) -> String {
    format!(
        "/nodes/{node}/extensions/{NAME}/constraint/{}/source",
        constraint.kind.name()
    )
}

// ─── Decode / encode ──────────────────────────────────────────────────────────

fn decode_axis(
    reader: ObjectReader<'_>,
    key: &str,
    allowed: &[&str],
    default: &str,
) -> Result<String> {
    let axis = reader.string_or(key, default)?;
    if allowed.contains(&axis.as_str()) {
        Ok(axis)
    } else {
        Err(VrmError::schema(
            reader.child_pointer(key),
            format!("one of {}", allowed.join(", ")),
            axis,
        ))
    }
}

fn decode_constraint(reader: ObjectReader<'_>) -> Result<NodeConstraint> {
    let spec_version = reader.string_or("specVersion", "1.0")?;
    let constraint = reader.require_object("constraint")?;
    let constraint = constraint.reader();

    let kind = if let Some(roll) = constraint.object("roll")? {
        let roll = roll.reader();
        ConstraintKind::Roll {
            source: roll.require_index("source")?,
            roll_axis: decode_axis(roll, "rollAxis", &ROLL_AXES, "X")?,
            weight: roll.f32_or("weight", 1.0)?,
        }
    } else if let Some(aim) = constraint.object("aim")? {
        let aim = aim.reader();
        ConstraintKind::Aim {
            source: aim.require_index("source")?,
            aim_axis: decode_axis(aim, "aimAxis", &AIM_AXES, "PositiveX")?,
            weight: aim.f32_or("weight", 1.0)?,
        }
    } else if let Some(rotation) = constraint.object("rotation")? {
        let rotation = rotation.reader();
        ConstraintKind::Rotation {
            source: rotation.require_index("source")?,
            weight: rotation.f32_or("weight", 1.0)?,
        }
    } else {
        return Err(VrmError::schema(
            constraint.pointer(),
            "roll, aim or rotation",
            "none of them",
        ));
    };

    Ok(NodeConstraint { spec_version, kind })
}

fn encode_constraint(constraint: &NodeConstraint) -> Value {
    let mut body = Map::new();
    body.insert("source".into(), json!(constraint.kind.source()));
    match &constraint.kind {
        ConstraintKind::Roll {
            roll_axis, weight, ..
        } => {
            body.insert("rollAxis".into(), json!(roll_axis));
            body.insert("weight".into(), float_value(*weight));
        }
        ConstraintKind::Aim {
            aim_axis, weight, ..
        } => {
            body.insert("aimAxis".into(), json!(aim_axis));
            body.insert("weight".into(), float_value(*weight));
        }
        ConstraintKind::Rotation { weight, .. } => {
            body.insert("weight".into(), float_value(*weight));
        }
    }

    let mut kind = Map::new();
    kind.insert(constraint.kind.name().to_string(), Value::Object(body));
    json!({
        "specVersion": constraint.spec_version,
        "constraint": kind,
    })
}

// ─── Validate ─────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Eq)]
enum Walk {
    Unvisited,
    OnPath,
    Done,
}

/// Follow every constraint's source chain; a chain that returns to a node
/// on the current path is a cycle, reported once at the node that closes it.
fn check_constraint_cycles(document: &Document, report: &mut IssueReport) {
    let nodes = &document.nodes;
    let mut state = vec![Walk::Unvisited; nodes.len()];

    for start in 0..nodes.len() {
        let mut path = Vec::new();
        let mut current = start;
        loop {
            match state[current] {
                Walk::Done => break,
                Walk::OnPath => {
                    let cycle_start = path
                        .iter()
                        .position(|node| *node == current)
                        .unwrap_or(0);
                    let cycle: Vec<String> = path[cycle_start..]
                        .iter()
                        .map(|node: &usize| node.to_string())
                        .collect();
                    if let Some(closing) = path.last().copied() {
                        if let Some(constraint) = &nodes[closing].constraint {
                            report.push(
                                IssueKind::NodeConstraintCycle,
                                constraint_pointer(closing, constraint),
                                format!(
                                    "constraint sources form a cycle through nodes {}",
                                    cycle.join(" -> ")
                                ),
                            );
                        }
                    }
                    break;
                }
                Walk::Unvisited => {}
            }
            let Some(constraint) = &nodes[current].constraint else {
                state[current] = Walk::Done;
                break;
            };
            state[current] = Walk::OnPath;
            path.push(current);
            let source = constraint.kind.source();
            if source >= nodes.len() {
                break;
            }
            current = source;
        }
        for node in path {
            state[node] = Walk::Done;
        }
    }
}

impl ExtensionSchema for NodeConstraintSchema {
    fn generation(&self) -> SpecGeneration {
        SpecGeneration::Vrm1
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn scope(&self) -> SchemaScope {
        SchemaScope::Node
    }

    fn decode(
        &self,
        reader: ObjectReader<'_>,
        target: SchemaTarget,
        document: &mut Document,
    ) -> Result<()> {
        let SchemaTarget::Node(index) = target else {
            return Err(VrmError::schema(reader.pointer(), "node extension", "other scope"));
        };
        let constraint = decode_constraint(reader)?;
        match document.nodes.get_mut(index) {
            Some(node) => {
                node.constraint = Some(constraint);
                Ok(())
            }
            None => Err(VrmError::schema(reader.pointer(), "existing node", "missing node")),
        }
    }

    fn encode(&self, document: &Document, target: SchemaTarget) -> Result<Option<Value>> {
        let SchemaTarget::Node(index) = target else {
            return Ok(None);
        };
        Ok(document
            .nodes
            .get(index)
            .and_then(|node| node.constraint.as_ref())
            .map(encode_constraint))
    }

    fn validate(&self, document: &Document, _graph: &NodeGraph, report: &mut IssueReport) {
        let mut resolved = true;
        for (index, node) in document.nodes.iter().enumerate() {
            if let Some(constraint) = &node.constraint {
                let before = report.issues().len();
                report.check_index(
                    constraint_pointer(index, constraint),
                    constraint.kind.source(),
                    document.nodes.len(),
                    "node",
                );
                resolved &= report.issues().len() == before;
            }
        }
        if resolved {
            check_constraint_cycles(document, report);
        }
    }

    fn remap(&self, document: &mut Document, tables: &RemapTables) -> Result<()> {
        for (index, node) in document.nodes.iter_mut().enumerate() {
            let Some(constraint) = node.constraint.as_mut() else {
                continue;
            };
            match tables.nodes.get(constraint.kind.source()) {
                Some(source) => *constraint.kind.source_mut() = source,
                None => {
                    log_debug!(
                        "node {index}: constraint source was not exported; constraint dropped"
                    );
                    node.constraint = None;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Node;

    fn constrained(source: usize) -> Node {
        Node {
            constraint: Some(NodeConstraint {
                spec_version: "1.0".to_string(),
                kind: ConstraintKind::Rotation { source, weight: 1.0 },
            }),
            ..Default::default()
        }
    }

    fn validate(nodes: Vec<Node>) -> IssueReport {
        let document = Document {
            nodes,
            ..Default::default()
        };
        let graph = NodeGraph::build(&document.nodes);
        let mut report = IssueReport::new();
        NodeConstraintSchema.validate(&document, &graph, &mut report);
        report
    }

    #[test]
    fn given_aim_block_when_decoding_then_axis_and_weight_are_kept() {
        let value = json!({
            "specVersion": "1.0",
            "constraint": { "aim": { "source": 2, "aimAxis": "NegativeY", "weight": 0.5 } }
        });
        let reader =
            ObjectReader::new(&value, "/nodes/0/extensions/VRMC_node_constraint").expect("object");
        let constraint = decode_constraint(reader).expect("decodes");

        assert_eq!(
            constraint.kind,
            ConstraintKind::Aim {
                source: 2,
                aim_axis: "NegativeY".to_string(),
                weight: 0.5
            }
        );
        assert_eq!(encode_constraint(&constraint), value);
    }

    #[test]
    fn given_unknown_roll_axis_when_decoding_then_schema_violation_names_axis() {
        let value = json!({ "constraint": { "roll": { "source": 1, "rollAxis": "W" } } });
        let reader =
            ObjectReader::new(&value, "/nodes/3/extensions/VRMC_node_constraint").expect("object");
        let err = decode_constraint(reader).expect_err("axis is closed");

        assert!(matches!(
            err,
            VrmError::SchemaViolation { ref path, .. }
                if path == "/nodes/3/extensions/VRMC_node_constraint/constraint/roll/rollAxis"
        ));
    }

    #[test]
    fn given_two_nodes_sourcing_each_other_when_validating_then_one_cycle_is_reported() {
        let report = validate(vec![constrained(1), constrained(0), Node::default()]);
        assert_eq!(report.count(IssueKind::NodeConstraintCycle), 1);
    }

    #[test]
    fn given_self_source_when_validating_then_cycle_is_reported() {
        let report = validate(vec![Node::default(), constrained(1)]);
        assert_eq!(report.count(IssueKind::NodeConstraintCycle), 1);
        assert_eq!(
            report.issues()[0].pointer,
            "/nodes/1/extensions/VRMC_node_constraint/constraint/rotation/source"
        );
    }

    #[test]
    fn given_acyclic_sources_when_validating_then_no_issue_is_reported() {
        let report = validate(vec![constrained(1), constrained(2), Node::default()]);
        assert!(report.is_empty());
    }

    #[test]
    fn given_dropped_source_when_remapping_then_constraint_is_removed() {
        let mut document = Document {
            nodes: vec![constrained(1), constrained(0)],
            ..Default::default()
        };
        let tables = RemapTables {
            nodes: crate::encode::remap::IndexMap::from_marks(&[true, false]),
            ..Default::default()
        };
        document.nodes.truncate(1);

        NodeConstraintSchema.remap(&mut document, &tables).expect("remaps");
        assert!(document.nodes[0].constraint.is_none());
    }
}
