//! JSON chunk → [`Document`].
//!
//! Core glTF entities are decoded here; every extension the registry owns is
//! handed to its schema. Decoding fails fast on the first schema violation.

mod data_uri;
mod gltf;
pub mod reader;

use bytes::Bytes;
use serde_json::Value;

use crate::container::decode_container;
use crate::document::{Document, SpecGeneration, VrmExtension};
use crate::error::Result;
use crate::registry::{ExtensionRegistry, SchemaScope, SchemaTarget};
use crate::{log_debug, log_info};

use reader::ObjectReader;

pub(crate) use gltf::{decode_texture_info, optional_texture_info};

/// Pick the generation from the root `extensions` object. The newest
/// generation whose marker is present wins.
fn detect_generation(
    root: ObjectReader<'_>,
    registry: &ExtensionRegistry,
) -> Option<SpecGeneration> {
    let markers = registry.generation_markers();
    let present: Vec<(SpecGeneration, &str)> = markers
        .iter()
        .copied()
        .filter(|(_, name)| root.extension(name).is_some())
        .collect();

    let (generation, name) = *present.first()?;
    for (ignored, ignored_name) in present.iter().skip(1) {
        log_debug!(
            "both '{name}' ({}) and '{ignored_name}' ({}) are present; '{name}' takes precedence",
            generation.as_str(),
            ignored.as_str()
        );
    }
    Some(generation)
}

/// Decode a parsed JSON document. `bin` is the GLB BIN chunk, if any.
pub fn decode(json: &Value, bin: Option<Bytes>, registry: &ExtensionRegistry) -> Result<Document> {
    let root = ObjectReader::new(json, "")?;
    let generation = detect_generation(root, registry);

    let mut root_owned = Vec::new();
    let mut node_owned = Vec::new();
    let mut material_owned = Vec::new();
    if let Some(generation) = generation {
        root_owned = registry.owned_names(generation, SchemaScope::Root);
        // Markers of other generations are superseded, not passed through.
        root_owned.extend(
            registry
                .generation_markers()
                .into_iter()
                .filter(|(marker, _)| *marker != generation)
                .map(|(_, name)| name),
        );
        node_owned = registry.owned_names(generation, SchemaScope::Node);
        material_owned = registry.owned_names(generation, SchemaScope::Material);
    }

    let asset = gltf::decode_asset(root.require_object("asset")?.reader())?;

    let mut document = Document {
        asset,
        scene: root.index("scene")?,
        extensions_used: root.strings("extensionsUsed")?,
        extensions_required: root.strings("extensionsRequired")?,
        extensions: root.extensions_except(&root_owned)?,
        extras: root.extras(),
        ..Default::default()
    };

    for child in root.objects("scenes")? {
        document.scenes.push(gltf::decode_scene(child.reader())?);
    }
    for child in root.objects("nodes")? {
        document.nodes.push(gltf::decode_node(child.reader(), &node_owned)?);
    }
    for child in root.objects("meshes")? {
        document.meshes.push(gltf::decode_mesh(child.reader())?);
    }
    for child in root.objects("materials")? {
        document
            .materials
            .push(gltf::decode_material(child.reader(), &material_owned)?);
    }
    for child in root.objects("textures")? {
        document.textures.push(gltf::decode_texture(child.reader())?);
    }
    for child in root.objects("images")? {
        document.images.push(gltf::decode_image(child.reader())?);
    }
    for child in root.objects("samplers")? {
        document.samplers.push(gltf::decode_sampler(child.reader())?);
    }
    for child in root.objects("accessors")? {
        document.accessors.push(gltf::decode_accessor(child.reader())?);
    }
    for child in root.objects("bufferViews")? {
        document
            .buffer_views
            .push(gltf::decode_buffer_view(child.reader())?);
    }
    for (index, child) in root.objects("buffers")?.iter().enumerate() {
        document
            .buffers
            .push(gltf::decode_buffer(child.reader(), index, bin.as_ref())?);
    }
    for child in root.objects("animations")? {
        document.animations.push(gltf::decode_animation(child.reader())?);
    }
    for child in root.objects("skins")? {
        document.skins.push(gltf::decode_skin(child.reader())?);
    }
    for child in root.objects("cameras")? {
        document.cameras.push(gltf::decode_camera(child.reader())?);
    }

    let Some(generation) = generation else {
        log_debug!("no VRM extension found; decoded as plain glTF");
        return Ok(document);
    };
    document.vrm = Some(VrmExtension::empty(generation));

    for schema in registry.for_scope(generation, SchemaScope::Root) {
        if let Some(value) = root.extension(schema.name()) {
            let pointer = format!("/extensions/{}", schema.name());
            let extension = ObjectReader::new(value, &pointer)?;
            schema.decode(extension, SchemaTarget::Root, &mut document)?;
        }
    }

    let scoped = [
        (SchemaScope::Node, "nodes"),
        (SchemaScope::Material, "materials"),
    ];
    for (scope, key) in scoped {
        let schemas: Vec<_> = registry.for_scope(generation, scope).collect();
        if schemas.is_empty() {
            continue;
        }
        for (index, child) in root.objects(key)?.iter().enumerate() {
            let entity = child.reader();
            for schema in &schemas {
                let Some(value) = entity.extension(schema.name()) else {
                    continue;
                };
                let pointer = format!("/{key}/{index}/extensions/{}", schema.name());
                let extension = ObjectReader::new(value, &pointer)?;
                let target = match scope {
                    SchemaScope::Node => SchemaTarget::Node(index),
                    _ => SchemaTarget::Material(index),
                };
                schema.decode(extension, target, &mut document)?;
            }
        }
    }

    log_info!(
        "decoded VRM {} document: {} nodes, {} meshes, {} materials",
        generation.as_str(),
        document.nodes.len(),
        document.meshes.len(),
        document.materials.len()
    );
    Ok(document)
}

/// Split a GLB container and decode its JSON chunk.
pub fn decode_bytes(bytes: impl Into<Bytes>, registry: &ExtensionRegistry) -> Result<Document> {
    let container = decode_container(bytes)?;
    let json: Value = serde_json::from_slice(&container.json)?;
    decode(&json, container.bin, registry)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::container::encode_container;
    use crate::error::VrmError;

    #[test]
    fn given_minimal_container_when_decoding_then_single_default_node_is_returned() {
        let json = br#"{"asset":{"version":"2.0"},"nodes":[{}]}"#;
        let bytes = encode_container(json, &[]);

        let document = decode_bytes(bytes, &ExtensionRegistry::default()).expect("valid container");

        assert_eq!(document.nodes.len(), 1);
        assert_eq!(document.nodes[0], crate::document::Node::default());
        assert!(document.vrm.is_none());
        assert!(document.buffers.is_empty());
    }

    #[test]
    fn given_string_translation_when_decoding_then_schema_violation_names_pointer() {
        let json = json!({
            "asset": { "version": "2.0" },
            "nodes": [{}, { "translation": [0.0, "up", 0.0] }]
        });

        let err = decode(&json, None, &ExtensionRegistry::default()).expect_err("bad type");
        assert!(matches!(
            err,
            VrmError::SchemaViolation { ref path, .. } if path == "/nodes/1/translation/1"
        ));
    }

    #[test]
    fn given_missing_asset_when_decoding_then_schema_violation_is_returned() {
        let err = decode(&json!({ "nodes": [] }), None, &ExtensionRegistry::default())
            .expect_err("asset is required");
        assert!(matches!(err, VrmError::SchemaViolation { ref path, .. } if path == "/asset"));
    }

    #[test]
    fn given_both_generations_when_decoding_then_vrm1_wins_and_vrm0_block_is_dropped() {
        let json = json!({
            "asset": { "version": "2.0" },
            "nodes": [{}],
            "extensionsUsed": ["VRM", "VRMC_vrm"],
            "extensions": {
                "VRM": { "meta": { "title": "old" } },
                "VRMC_vrm": {
                    "specVersion": "1.0",
                    "meta": {
                        "name": "new",
                        "authors": ["a"],
                        "licenseUrl": "https://vrm.dev/licenses/1.0/"
                    },
                    "humanoid": { "humanBones": { "hips": { "node": 0 } } }
                },
                "EXT_vendor": { "kept": true }
            }
        });

        let document = decode(&json, None, &ExtensionRegistry::default()).expect("decodes");

        assert_eq!(document.generation(), Some(SpecGeneration::Vrm1));
        assert_eq!(document.vrm1().map(|vrm| vrm.meta.name.as_str()), Some("new"));
        assert!(!document.extensions.contains_key("VRM"));
        assert!(document.extensions.contains_key("EXT_vendor"));
    }

    #[test]
    fn given_empty_registry_when_decoding_vrm_then_extensions_pass_through() {
        let json = json!({
            "asset": { "version": "2.0" },
            "extensions": { "VRM": { "meta": {} } }
        });

        let document = decode(&json, None, &ExtensionRegistry::new()).expect("decodes");
        assert!(document.vrm.is_none());
        assert!(document.extensions.contains_key("VRM"));
    }

    #[test]
    fn given_bin_chunk_when_decoding_then_first_buffer_borrows_it() {
        let json = br#"{"asset":{"version":"2.0"},"buffers":[{"byteLength":3}]}"#;
        let bytes = encode_container(json, &[7, 8, 9]);

        let document = decode_bytes(bytes, &ExtensionRegistry::default()).expect("valid");
        assert_eq!(document.buffers[0].data.as_deref(), Some(&[7u8, 8, 9][..]));
    }
}
