//! Generation-neutral avatar description produced by the normalizer.

use std::collections::BTreeMap;

use super::humanoid::HumanBone;
use super::vrm1::{Expression, ExpressionPreset, FirstPersonAnnotation, LookAt, Meta, SpringBone};

/// One expression in canonical form: a name, an optional preset role and
/// the binds that drive it.
#[derive(Debug, Clone, PartialEq)]
pub struct AvatarExpression {
    pub name: String,
    pub preset: Option<ExpressionPreset>,
    pub expression: Expression,
}

impl AvatarExpression {
    pub fn is_binary(&self) -> bool {
        self.expression.is_binary
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Avatar {
    pub meta: Meta,
    pub humanoid: BTreeMap<HumanBone, usize>,
    pub first_person: Vec<FirstPersonAnnotation>,
    pub look_at: LookAt,
    /// Presets first, in preset order, then custom expressions.
    pub expressions: Vec<AvatarExpression>,
    pub spring_bone: SpringBone,
}

impl Avatar {
    pub fn expression(&self, name: &str) -> Option<&AvatarExpression> {
        self.expressions
            .iter()
            .find(|expression| expression.name == name)
    }
}
