//! Pluggable extension schemas keyed by `(generation, extension name)`.
//!
//! The decoder, validator and encoder iterate the registry; they never name a
//! concrete extension. Registering a new schema is enough to have its block
//! decoded, checked, re-encoded and remapped on subset export.

mod mtoon;
mod node_constraint;
mod spring_bone;
mod vrm0;
mod vrmc_vrm;

use serde_json::Value;

use crate::decode::reader::ObjectReader;
use crate::document::{Document, SpecGeneration};
use crate::encode::remap::{ReferenceMarks, RemapTables};
use crate::error::{Result, VrmError};
use crate::validate::{IssueReport, NodeGraph};
use crate::vrm::HumanBone;

pub use mtoon::MToonSchema;
pub use node_constraint::NodeConstraintSchema;
pub use spring_bone::SpringBoneSchema;
pub use vrm0::Vrm0Schema;
pub use vrmc_vrm::VrmcVrmSchema;

/// Where in the document an extension object lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaScope {
    Root,
    Node,
    Material,
}

/// The concrete object an extension is being decoded into or encoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaTarget {
    Root,
    Node(usize),
    Material(usize),
}

pub trait ExtensionSchema: Send + Sync {
    fn generation(&self) -> SpecGeneration;

    /// Extension key, e.g. `VRMC_springBone`.
    fn name(&self) -> &'static str;

    fn scope(&self) -> SchemaScope;

    /// Whether the presence of this extension selects its generation.
    fn marks_generation(&self) -> bool {
        false
    }

    /// Read the extension object into the document. Fails fast on the first
    /// schema violation.
    fn decode(
        &self,
        reader: ObjectReader<'_>,
        target: SchemaTarget,
        document: &mut Document,
    ) -> Result<()>;

    /// Produce the extension object for `target`, or `None` when there is
    /// nothing to emit.
    fn encode(&self, document: &Document, target: SchemaTarget) -> Result<Option<Value>>;

    /// Add semantic issues for this extension's data.
    fn validate(&self, document: &Document, graph: &NodeGraph, report: &mut IssueReport);

    /// Mark materials, textures and images this extension keeps alive when a
    /// node subset is exported.
    fn mark_references(&self, _document: &Document, _marks: &mut ReferenceMarks) {}

    /// Rewrite this extension's indices after a subset export renumbered the
    /// document. Dropping data the target generation requires is an error.
    fn remap(&self, document: &mut Document, tables: &RemapTables) -> Result<()>;
}

pub struct ExtensionRegistry {
    schemas: Vec<Box<dyn ExtensionSchema>>,
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::with_vrm_schemas()
    }
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(
                self.schemas
                    .iter()
                    .map(|schema| (schema.generation().as_str(), schema.name())),
            )
            .finish()
    }
}

impl ExtensionRegistry {
    /// An empty registry: every extension is treated as pass-through.
    pub fn new() -> Self {
        Self {
            schemas: Vec::new(),
        }
    }

    /// Registry with the published VRM 0.x and 1.0 extensions.
    pub fn with_vrm_schemas() -> Self {
        let mut registry = Self::new();
        registry.register(Vrm0Schema);
        registry.register(VrmcVrmSchema);
        registry.register(SpringBoneSchema);
        registry.register(NodeConstraintSchema);
        registry.register(MToonSchema);
        registry
    }

    /// Add a schema, replacing any previous one with the same generation and name.
    pub fn register(&mut self, schema: impl ExtensionSchema + 'static) {
        self.schemas.retain(|existing| {
            existing.generation() != schema.generation() || existing.name() != schema.name()
        });
        self.schemas.push(Box::new(schema));
    }

    pub fn lookup(&self, generation: SpecGeneration, name: &str) -> Option<&dyn ExtensionSchema> {
        self.schemas
            .iter()
            .find(|schema| schema.generation() == generation && schema.name() == name)
            .map(|schema| &**schema)
    }

    pub fn for_generation(
        &self,
        generation: SpecGeneration,
    ) -> impl Iterator<Item = &dyn ExtensionSchema> {
        self.schemas
            .iter()
            .filter(move |schema| schema.generation() == generation)
            .map(|schema| &**schema)
    }

    pub fn for_scope(
        &self,
        generation: SpecGeneration,
        scope: SchemaScope,
    ) -> impl Iterator<Item = &dyn ExtensionSchema> {
        self.for_generation(generation)
            .filter(move |schema| schema.scope() == scope)
    }

    /// Extension names owned by `generation` at `scope`.
    pub fn owned_names(&self, generation: SpecGeneration, scope: SchemaScope) -> Vec<&'static str> {
        self.for_scope(generation, scope)
            .map(|schema| schema.name())
            .collect()
    }

    /// Extension names owned by any generation at `scope`.
    pub fn all_names(&self, scope: SchemaScope) -> Vec<&'static str> {
        self.schemas
            .iter()
            .filter(|schema| schema.scope() == scope)
            .map(|schema| schema.name())
            .collect()
    }

    /// Names whose presence selects a generation, newest generation first.
    pub fn generation_markers(&self) -> Vec<(SpecGeneration, &'static str)> {
        let mut markers: Vec<_> = self
            .schemas
            .iter()
            .filter(|schema| schema.marks_generation())
            .map(|schema| (schema.generation(), schema.name()))
            .collect();
        markers.sort_by(|a, b| b.0.cmp(&a.0));
        markers
    }
}

// ─── Shared helpers ───────────────────────────────────────────────────────────

/// New node of a humanoid bone after a subset export. Dropping a required
/// bone is an error; optional bones are simply unassigned.
fn remap_bone(
    bone: HumanBone,
    node: usize,
    generation: SpecGeneration,
    tables: &RemapTables,
    pointer: &str,
) -> Result<Option<usize>> {
    match tables.nodes.get(node) {
        Some(node) => Ok(Some(node)),
        None if bone.is_required(generation) => Err(VrmError::encoding(
            pointer,
            format!("required bone '{}' is outside the exported nodes", bone.as_str()),
        )),
        None => Ok(None),
    }
}

pub(crate) fn texture_info_value(info: &crate::document::TextureInfo) -> Value {
    let mut object = serde_json::Map::new();
    object.insert("index".to_string(), Value::from(info.index));
    if info.tex_coord != 0 {
        object.insert("texCoord".to_string(), Value::from(info.tex_coord));
    }
    if !info.extensions.is_empty() {
        object.insert(
            "extensions".to_string(),
            Value::Object(info.extensions.clone().into_iter().collect()),
        );
    }
    Value::Object(object)
}

pub(crate) fn floats_value(values: &[f32]) -> Value {
    Value::Array(values.iter().map(|value| float_value(*value)).collect())
}

/// JSON number for an `f32`, widened through its shortest decimal form so
/// `0.1f32` is written as `0.1` rather than `0.10000000149011612`.
pub(crate) fn float_value(value: f32) -> Value {
    value
        .to_string()
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_default_registry_when_listing_markers_then_vrm1_comes_first() {
        let registry = ExtensionRegistry::default();
        let markers = registry.generation_markers();

        assert_eq!(
            markers,
            vec![(SpecGeneration::Vrm1, "VRMC_vrm"), (SpecGeneration::Vrm0, "VRM")]
        );
        assert_eq!(
            registry.owned_names(SpecGeneration::Vrm1, SchemaScope::Material),
            vec!["VRMC_materials_mtoon"]
        );
    }

    #[test]
    fn given_schema_registered_twice_when_looking_up_then_only_one_remains() {
        let mut registry = ExtensionRegistry::default();
        registry.register(MToonSchema);

        assert_eq!(registry.for_generation(SpecGeneration::Vrm1).count(), 4);
        assert!(registry.lookup(SpecGeneration::Vrm0, "VRM").is_some());
        assert!(registry.lookup(SpecGeneration::Vrm0, "VRMC_vrm").is_none());
    }

    #[test]
    fn given_single_precision_value_when_widening_then_shortest_form_is_kept() {
        assert_eq!(float_value(0.1), serde_json::json!(0.1));
        assert_eq!(float_value(f32::NAN), Value::Null);
    }
}
