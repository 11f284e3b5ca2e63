//! Typed VRM extension blocks for both VRM generations, plus the canonical
//! avatar shape the rest of the pipeline works on.

pub mod avatar;
pub mod constraint;
pub mod humanoid;
pub mod mtoon;
pub mod vrm0;
pub mod vrm1;

pub use avatar::{Avatar, AvatarExpression};
pub use constraint::{ConstraintKind, NodeConstraint};
pub use humanoid::HumanBone;
pub use vrm0::Vrm0;
pub use vrm1::Vrm1;
