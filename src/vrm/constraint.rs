//! `VRMC_node_constraint` payload attached to a node.

pub const ROLL_AXES: [&str; 3] = ["X", "Y", "Z"];
pub const AIM_AXES: [&str; 6] = [
    "PositiveX",
    "NegativeX",
    "PositiveY",
    "NegativeY",
    "PositiveZ",
    "NegativeZ",
];

#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintKind {
    Roll {
        source: usize,
        roll_axis: String,
        weight: f32,
    },
    Aim {
        source: usize,
        aim_axis: String,
        weight: f32,
    },
    Rotation {
        source: usize,
        weight: f32,
    },
}

impl ConstraintKind {
    pub fn name(&self) -> &'static str {
        match self {
            ConstraintKind::Roll { .. } => "roll",
            ConstraintKind::Aim { .. } => "aim",
            ConstraintKind::Rotation { .. } => "rotation",
        }
    }

    pub fn source(&self) -> usize {
        match self {
            ConstraintKind::Roll { source, .. }
            | ConstraintKind::Aim { source, .. }
            | ConstraintKind::Rotation { source, .. } => *source,
        }
    }

    pub fn source_mut(&mut self) -> &mut usize {
        match self {
            ConstraintKind::Roll { source, .. }
            | ConstraintKind::Aim { source, .. }
            | ConstraintKind::Rotation { source, .. } => source,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeConstraint {
    pub spec_version: String,
    pub kind: ConstraintKind,
}
