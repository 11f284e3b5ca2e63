//! VRM 0.x / 1.0 glTF binary container codec.
//!
//! Bytes are decoded into a typed [`Document`], validated into a
//! [`ValidatedDocument`] and encoded back, optionally into the other VRM
//! generation or as a node subset. [`Codec`] bundles the steps.

pub mod container;
pub mod decode;
pub mod document;
pub mod encode;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod registry;
pub mod settings;
pub mod validate;
pub mod vrm;

#[cfg(test)]
pub(crate) mod fixtures;

pub use document::{Document, SpecGeneration};
pub use error::{FramingError, Result, VrmError};
pub use pipeline::{AnalysisReport, Codec, ExportOptions, Exported};
pub use settings::CodecSettings;
pub use validate::{IssueKind, Severity, ValidatedDocument, ValidationIssue};
