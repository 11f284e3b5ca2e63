//! Document → GLB container.
//!
//! Encoding takes a [`ValidatedDocument`], so the cross-references it writes
//! are known to resolve. The only failures left are encoding constraints:
//! unloaded buffers, subset exports that drop required data, and name
//! collisions the target schema forbids.

mod gltf;
mod layout;
pub mod remap;

use serde_json::Value;

use crate::container::encode_container;
use crate::document::Document;
use crate::error::Result;
use crate::registry::ExtensionRegistry;
use crate::validate::ValidatedDocument;
use crate::log_info;

pub use layout::pack_binary;
pub use remap::NodeSelection;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    pub selection: NodeSelection,
}

/// JSON document and packed binary chunk, ready to be framed.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedDocument {
    pub json: Value,
    pub bin: Vec<u8>,
}

impl EncodedDocument {
    pub fn to_glb(&self) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(&self.json)?;
        Ok(encode_container(&json, &self.bin))
    }
}

pub(crate) fn encode_document(
    document: &Document,
    registry: &ExtensionRegistry,
    options: &EncodeOptions,
) -> Result<EncodedDocument> {
    let subset;
    let document = match &options.selection {
        NodeSelection::All => document,
        NodeSelection::Subtrees(roots) => {
            subset = remap::select_subtrees(document, roots, registry)?;
            &subset
        }
    };

    let (packed, bin) = pack_binary(document)?;
    let json = gltf::write_document(&packed, registry)?;
    log_info!(
        "encoded {} nodes, {} accessors, {} byte binary chunk",
        packed.nodes.len(),
        packed.accessors.len(),
        bin.len()
    );
    Ok(EncodedDocument { json, bin })
}

/// Encode a validated document in its own generation.
pub fn encode(
    validated: &ValidatedDocument,
    registry: &ExtensionRegistry,
    options: &EncodeOptions,
) -> Result<EncodedDocument> {
    encode_document(&validated.document, registry, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode_bytes;
    use crate::error::VrmError;
    use crate::fixtures;
    use crate::settings::CodecSettings;
    use crate::validate::validate;
    use crate::vrm::HumanBone;

    fn encode_all(document: &Document) -> Vec<u8> {
        let registry = ExtensionRegistry::default();
        let validated =
            validate(document, &registry, &CodecSettings::default()).expect("fixture validates");
        encode(&validated, &registry, &EncodeOptions::default())
            .and_then(|encoded| encoded.to_glb())
            .expect("fixture encodes")
    }

    fn decode(bytes: Vec<u8>) -> Document {
        decode_bytes(bytes, &ExtensionRegistry::default()).expect("encoded bytes decode")
    }

    fn assert_graph_preserved(original: &Document, decoded: &Document) {
        assert_eq!(decoded.nodes, original.nodes);
        assert_eq!(decoded.meshes, original.meshes);
        assert_eq!(decoded.materials, original.materials);
        assert_eq!(decoded.accessors, original.accessors);
        assert_eq!(decoded.buffer_views, original.buffer_views);
        assert_eq!(decoded.scenes, original.scenes);
        assert_eq!(decoded.vrm, original.vrm);
    }

    #[test]
    fn given_vrm1_fixture_when_encoding_and_decoding_then_document_is_preserved() {
        let original = fixtures::vrm1_document();
        let decoded = decode(encode_all(&original));
        assert_graph_preserved(&original, &decoded);
    }

    #[test]
    fn given_vrm0_fixture_when_encoding_and_decoding_then_document_is_preserved() {
        let original = fixtures::vrm0_document();
        let decoded = decode(encode_all(&original));
        assert_graph_preserved(&original, &decoded);
    }

    #[test]
    fn given_encoded_document_when_reencoding_then_bytes_are_identical() {
        let first = encode_all(&fixtures::vrm1_document());
        let second = encode_all(&decode(first.clone()));

        assert_eq!(first, second);
    }

    #[test]
    fn given_hair_subtree_when_exporting_subset_then_nodes_are_renumbered_from_zero() {
        let registry = ExtensionRegistry::default();
        let document = fixtures::plain_document();

        let encoded = encode_document(
            &document,
            &registry,
            &EncodeOptions {
                selection: NodeSelection::Subtrees(vec![fixtures::HAIR_ROOT]),
            },
        )
        .expect("subset encodes");
        let decoded = decode(encoded.to_glb().expect("frames"));

        assert_eq!(decoded.nodes.len(), 2);
        assert_eq!(decoded.nodes[0].children, vec![1]);
        assert!(decoded.meshes.is_empty());
        assert_eq!(decoded.scenes[0].nodes, vec![0]);
    }

    #[test]
    fn given_subset_without_hips_when_exporting_vrm_then_encoding_constraint_is_violated() {
        let registry = ExtensionRegistry::default();
        let document = fixtures::vrm1_document();
        assert_eq!(
            document.vrm1().and_then(|vrm| vrm.humanoid.get(&HumanBone::Hips)),
            Some(&fixtures::HIPS)
        );

        let err = encode_document(
            &document,
            &registry,
            &EncodeOptions {
                selection: NodeSelection::Subtrees(vec![fixtures::HAIR_ROOT]),
            },
        )
        .expect_err("hips is outside the subset");

        assert!(matches!(err, VrmError::EncodingConstraintViolation { .. }));
    }

    #[test]
    fn given_encoded_vrm_when_read_by_gltf_crate_then_structure_matches() {
        let original = fixtures::vrm1_document();
        let bytes = encode_all(&original);

        let gltf = ::gltf::Gltf::from_slice(&bytes).expect("gltf crate accepts the container");

        assert_eq!(gltf.nodes().count(), original.nodes.len());
        assert_eq!(gltf.meshes().count(), original.meshes.len());
        assert_eq!(gltf.accessors().count(), original.accessors.len());
        let blob = gltf.blob.as_ref().expect("binary chunk");
        assert!(blob.len() >= original.buffers[0].byte_length);
        let names: Vec<_> = gltf.nodes().filter_map(|node| node.name()).collect();
        assert!(names.contains(&"hips"));
        assert!(gltf.extensions_used().any(|name| name == "VRMC_vrm"));
    }
}
