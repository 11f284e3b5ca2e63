use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity level used by validation issues.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Closed set of issue codes. The serialized names follow glTF-validator
/// conventions so reports can be compared against it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueKind {
    UnresolvedReference,
    CyclicNodeGraph,
    NodeParentOverride,
    NodeMatrixNonTrs,
    RotationNonUnit,
    AccessorOutOfBounds,
    AccessorOffsetAlignment,
    BufferViewOutOfBounds,
    BufferMissingData,
    DuplicateBoneAssignment,
    MissingRequiredBone,
    InvalidBoneHierarchy,
    InvalidSpringBoneChain,
    NodeConstraintCycle,
    InvalidMeta,
    MissingOptionalBone,
    MtoonValueOutOfRange,
    MultipleExtensions,
    InvalidExtensionNameFormat,
    MeshPrimitiveGeneratedTangentSpace,
    ImageMimeTypeMismatch,
    ImageUnrecognizedFormat,
    UnknownMaterialName,
    MigrationLoss,
}

impl IssueKind {
    pub fn code(self) -> &'static str {
        match self {
            IssueKind::UnresolvedReference => "UNRESOLVED_REFERENCE",
            IssueKind::CyclicNodeGraph => "CYCLIC_NODE_GRAPH",
            IssueKind::NodeParentOverride => "NODE_PARENT_OVERRIDE",
            IssueKind::NodeMatrixNonTrs => "NODE_MATRIX_NON_TRS",
            IssueKind::RotationNonUnit => "ROTATION_NON_UNIT",
            IssueKind::AccessorOutOfBounds => "ACCESSOR_OUT_OF_BOUNDS",
            IssueKind::AccessorOffsetAlignment => "ACCESSOR_OFFSET_ALIGNMENT",
            IssueKind::BufferViewOutOfBounds => "BUFFER_VIEW_OUT_OF_BOUNDS",
            IssueKind::BufferMissingData => "BUFFER_MISSING_DATA",
            IssueKind::DuplicateBoneAssignment => "DUPLICATE_BONE_ASSIGNMENT",
            IssueKind::MissingRequiredBone => "MISSING_REQUIRED_BONE",
            IssueKind::InvalidBoneHierarchy => "INVALID_BONE_HIERARCHY",
            IssueKind::InvalidSpringBoneChain => "INVALID_SPRING_BONE_CHAIN",
            IssueKind::NodeConstraintCycle => "NODE_CONSTRAINT_CYCLE",
            IssueKind::InvalidMeta => "INVALID_META",
            IssueKind::MissingOptionalBone => "MISSING_OPTIONAL_BONE",
            IssueKind::MtoonValueOutOfRange => "MTOON_VALUE_OUT_OF_RANGE",
            IssueKind::MultipleExtensions => "MULTIPLE_EXTENSIONS",
            IssueKind::InvalidExtensionNameFormat => "INVALID_EXTENSION_NAME_FORMAT",
            IssueKind::MeshPrimitiveGeneratedTangentSpace => {
                "MESH_PRIMITIVE_GENERATED_TANGENT_SPACE"
            }
            IssueKind::ImageMimeTypeMismatch => "IMAGE_MIME_TYPE_MISMATCH",
            IssueKind::ImageUnrecognizedFormat => "IMAGE_UNRECOGNIZED_FORMAT",
            IssueKind::UnknownMaterialName => "UNKNOWN_MATERIAL_NAME",
            IssueKind::MigrationLoss => "MIGRATION_LOSS",
        }
    }

    /// Severity an issue of this kind is reported with.
    pub fn severity(self) -> Severity {
        match self {
            IssueKind::MissingOptionalBone
            | IssueKind::MtoonValueOutOfRange
            | IssueKind::MultipleExtensions
            | IssueKind::InvalidExtensionNameFormat
            | IssueKind::MeshPrimitiveGeneratedTangentSpace
            | IssueKind::ImageMimeTypeMismatch
            | IssueKind::ImageUnrecognizedFormat
            | IssueKind::UnknownMaterialName
            | IssueKind::MigrationLoss => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A single validation issue, shaped like a glTF-validator message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: IssueKind,
    /// JSON pointer into the document.
    pub pointer: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARN",
        };
        write!(f, "[{tag}] {} {}: {}", self.code, self.pointer, self.message)
    }
}

/// Accumulates issues across a validation pass.
#[derive(Debug, Clone, Default)]
pub struct IssueReport {
    issues: Vec<ValidationIssue>,
}

impl IssueReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        code: IssueKind,
        pointer: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.issues.push(ValidationIssue {
            severity: code.severity(),
            code,
            pointer: pointer.into(),
            message: message.into(),
        });
    }

    /// Report an index that does not resolve into a collection of `len` entries.
    pub fn check_index(
        &mut self,
        pointer: impl Into<String>,
        index: usize,
        len: usize,
        what: &str,
    ) {
        if index >= len {
            self.push(
                IssueKind::UnresolvedReference,
                pointer,
                format!("{what} index {index} is out of range ({len} available)"),
            );
        }
    }

    pub fn extend(&mut self, issues: impl IntoIterator<Item = ValidationIssue>) {
        self.issues.extend(issues);
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn has_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.severity == Severity::Error)
    }

    pub fn count(&self, code: IssueKind) -> usize {
        self.issues.iter().filter(|issue| issue.code == code).count()
    }

    pub fn contains(&self, code: IssueKind) -> bool {
        self.count(code) > 0
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn into_issues(self) -> Vec<ValidationIssue> {
        self.issues
    }
}
