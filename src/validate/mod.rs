//! Cross-reference resolution and semantic checks.
//!
//! Unlike decoding, validation never stops at the first problem: every
//! discoverable issue is collected so an authoring tool can show them all.

mod graph;
pub(crate) mod humanoid;
pub(crate) mod spring;
mod types;

pub use graph::NodeGraph;
pub use types::*;

use crate::document::{Accessor, Document, Material, SparseAccessor, Transform};
use crate::normalize::{CanonicalDocument, to_canonical};
use crate::registry::ExtensionRegistry;
use crate::settings::CodecSettings;
use crate::{log_debug, log_info};

/// A document with no error-level issues, plus its canonical avatar view.
#[derive(Debug, Clone)]
pub struct ValidatedDocument {
    pub document: Document,
    pub canonical: CanonicalDocument,
    pub warnings: Vec<ValidationIssue>,
}

const UNIT_ROTATION_TOLERANCE: f32 = 1e-5;
const UNLIT_EXTENSION: &str = "KHR_materials_unlit";

// ─── Core glTF checks ─────────────────────────────────────────────────────────

fn check_scenes(document: &Document, report: &mut IssueReport) {
    if let Some(scene) = document.scene {
        report.check_index("/scene", scene, document.scenes.len(), "scene");
    }
    for (index, scene) in document.scenes.iter().enumerate() {
        for (slot, &node) in scene.nodes.iter().enumerate() {
            report.check_index(
                format!("/scenes/{index}/nodes/{slot}"),
                node,
                document.nodes.len(),
                "node",
            );
        }
    }
}

fn scene_roots(document: &Document) -> Vec<usize> {
    document
        .scenes
        .iter()
        .flat_map(|scene| scene.nodes.iter().copied())
        .collect()
}

fn check_nodes(document: &Document, graph: &NodeGraph, report: &mut IssueReport) {
    for (index, node) in document.nodes.iter().enumerate() {
        let pointer = format!("/nodes/{index}");
        for (slot, &child) in node.children.iter().enumerate() {
            report.check_index(
                format!("{pointer}/children/{slot}"),
                child,
                document.nodes.len(),
                "node",
            );
        }
        if let Some(mesh) = node.mesh {
            report.check_index(format!("{pointer}/mesh"), mesh, document.meshes.len(), "mesh");
        }
        if let Some(skin) = node.skin {
            report.check_index(format!("{pointer}/skin"), skin, document.skins.len(), "skin");
        }
        if let Some(camera) = node.camera {
            report.check_index(
                format!("{pointer}/camera"),
                camera,
                document.cameras.len(),
                "camera",
            );
        }

        match &node.transform {
            Transform::Matrix(values) => {
                if [values[3], values[7], values[11], values[15]] != [0.0, 0.0, 0.0, 1.0] {
                    report.push(
                        IssueKind::NodeMatrixNonTrs,
                        format!("{pointer}/matrix"),
                        "matrix is not decomposable to TRS",
                    );
                }
            }
            transform => {
                if let Some(norm) = transform.rotation_norm() {
                    if (norm - 1.0).abs() > UNIT_ROTATION_TOLERANCE {
                        report.push(
                            IssueKind::RotationNonUnit,
                            format!("{pointer}/rotation"),
                            format!("rotation quaternion has length {norm}"),
                        );
                    }
                }
            }
        }
    }

    for (parent, child) in graph.find_cycles(&scene_roots(document)) {
        report.push(
            IssueKind::CyclicNodeGraph,
            format!("/nodes/{parent}/children"),
            format!("node {child} is its own ancestor through node {parent}"),
        );
    }
    for &(child, parent) in graph.parent_overrides() {
        report.push(
            IssueKind::NodeParentOverride,
            format!("/nodes/{parent}/children"),
            format!("node {child} already has a parent"),
        );
    }
}

fn check_meshes(document: &Document, report: &mut IssueReport) {
    let accessor_count = document.accessors.len();
    for (mesh_index, mesh) in document.meshes.iter().enumerate() {
        for (index, primitive) in mesh.primitives.iter().enumerate() {
            let pointer = format!("/meshes/{mesh_index}/primitives/{index}");
            for (name, &accessor) in &primitive.attributes {
                report.check_index(
                    format!("{pointer}/attributes/{name}"),
                    accessor,
                    accessor_count,
                    "accessor",
                );
            }
            if let Some(indices) = primitive.indices {
                report.check_index(
                    format!("{pointer}/indices"),
                    indices,
                    accessor_count,
                    "accessor",
                );
            }
            for (target_index, target) in primitive.targets.iter().enumerate() {
                for (name, &accessor) in target {
                    report.check_index(
                        format!("{pointer}/targets/{target_index}/{name}"),
                        accessor,
                        accessor_count,
                        "accessor",
                    );
                }
            }
            let Some(material) = primitive.material else {
                continue;
            };
            let Some(material) = document.materials.get(material) else {
                report.check_index(
                    format!("{pointer}/material"),
                    material,
                    document.materials.len(),
                    "material",
                );
                continue;
            };
            let needs_tangents = material.normal_texture.is_some()
                && primitive.attributes.contains_key("NORMAL")
                && !primitive.attributes.contains_key("TANGENT");
            if needs_tangents {
                report.push(
                    IssueKind::MeshPrimitiveGeneratedTangentSpace,
                    pointer,
                    "normal-mapped primitive has no TANGENT attribute; tangents will be generated",
                );
            }
        }
    }
}

fn core_texture_slots(material: &Material) -> Vec<(&'static str, usize)> {
    let mut slots = Vec::new();
    if let Some(info) = &material.pbr.base_color_texture {
        slots.push(("pbrMetallicRoughness/baseColorTexture", info.index));
    }
    if let Some(info) = &material.pbr.metallic_roughness_texture {
        slots.push(("pbrMetallicRoughness/metallicRoughnessTexture", info.index));
    }
    if let Some(normal) = &material.normal_texture {
        slots.push(("normalTexture", normal.info.index));
    }
    if let Some(occlusion) = &material.occlusion_texture {
        slots.push(("occlusionTexture", occlusion.info.index));
    }
    if let Some(info) = &material.emissive_texture {
        slots.push(("emissiveTexture", info.index));
    }
    slots
}

fn check_materials(document: &Document, report: &mut IssueReport) {
    for (index, material) in document.materials.iter().enumerate() {
        for (slot, texture) in core_texture_slots(material) {
            report.check_index(
                format!("/materials/{index}/{slot}/index"),
                texture,
                document.textures.len(),
                "texture",
            );
        }

        let others = material
            .extensions
            .keys()
            .filter(|name| name.as_str() != UNLIT_EXTENSION)
            .count()
            + usize::from(material.mtoon.is_some());
        if material.extensions.contains_key(UNLIT_EXTENSION) && others > 0 {
            report.push(
                IssueKind::MultipleExtensions,
                format!("/materials/{index}/extensions"),
                format!("{UNLIT_EXTENSION} is combined with other material extensions"),
            );
        }
    }
}

fn check_textures_and_images(document: &Document, report: &mut IssueReport) {
    for (index, texture) in document.textures.iter().enumerate() {
        if let Some(source) = texture.source {
            report.check_index(
                format!("/textures/{index}/source"),
                source,
                document.images.len(),
                "image",
            );
        }
        if let Some(sampler) = texture.sampler {
            report.check_index(
                format!("/textures/{index}/sampler"),
                sampler,
                document.samplers.len(),
                "sampler",
            );
        }
    }

    for (index, image) in document.images.iter().enumerate() {
        let pointer = format!("/images/{index}");
        let Some(view) = image.buffer_view else {
            continue;
        };
        if view >= document.buffer_views.len() {
            report.check_index(
                format!("{pointer}/bufferView"),
                view,
                document.buffer_views.len(),
                "buffer view",
            );
            continue;
        }
        let Some(bytes) = document.buffer_view_bytes(view) else {
            continue;
        };
        match image::guess_format(&bytes) {
            Ok(format) => {
                let sniffed = format.to_mime_type();
                if let Some(declared) = &image.mime_type {
                    if declared != sniffed {
                        report.push(
                            IssueKind::ImageMimeTypeMismatch,
                            format!("{pointer}/mimeType"),
                            format!("declared '{declared}' but data looks like '{sniffed}'"),
                        );
                    }
                }
            }
            Err(_) => report.push(
                IssueKind::ImageUnrecognizedFormat,
                pointer,
                "image data is not a recognised format",
            ),
        }
    }
}

fn check_skins_and_animations(document: &Document, report: &mut IssueReport) {
    let node_count = document.nodes.len();
    let accessor_count = document.accessors.len();
    for (index, skin) in document.skins.iter().enumerate() {
        let pointer = format!("/skins/{index}");
        for (slot, &joint) in skin.joints.iter().enumerate() {
            report.check_index(format!("{pointer}/joints/{slot}"), joint, node_count, "node");
        }
        if let Some(skeleton) = skin.skeleton {
            report.check_index(format!("{pointer}/skeleton"), skeleton, node_count, "node");
        }
        if let Some(accessor) = skin.inverse_bind_matrices {
            report.check_index(
                format!("{pointer}/inverseBindMatrices"),
                accessor,
                accessor_count,
                "accessor",
            );
        }
    }

    for (index, animation) in document.animations.iter().enumerate() {
        let pointer = format!("/animations/{index}");
        for (slot, channel) in animation.channels.iter().enumerate() {
            report.check_index(
                format!("{pointer}/channels/{slot}/sampler"),
                channel.sampler,
                animation.samplers.len(),
                "animation sampler",
            );
            if let Some(node) = channel.target.node {
                report.check_index(
                    format!("{pointer}/channels/{slot}/target/node"),
                    node,
                    node_count,
                    "node",
                );
            }
        }
        for (slot, sampler) in animation.samplers.iter().enumerate() {
            report.check_index(
                format!("{pointer}/samplers/{slot}/input"),
                sampler.input,
                accessor_count,
                "accessor",
            );
            report.check_index(
                format!("{pointer}/samplers/{slot}/output"),
                sampler.output,
                accessor_count,
                "accessor",
            );
        }
    }
}

fn check_accessors(document: &Document, report: &mut IssueReport) {
    let view_count = document.buffer_views.len();
    for (index, accessor) in document.accessors.iter().enumerate() {
        let pointer = format!("/accessors/{index}");
        if let Some(sparse) = &accessor.sparse {
            check_sparse(document, accessor, sparse, &pointer, report);
        }

        let Some(view_index) = accessor.buffer_view else {
            continue;
        };
        let Some(view) = document.buffer_views.get(view_index) else {
            report.check_index(
                format!("{pointer}/bufferView"),
                view_index,
                view_count,
                "buffer view",
            );
            continue;
        };

        let component = accessor.component_type.size();
        let absolute = view.byte_offset.checked_add(accessor.byte_offset);
        let misaligned = absolute.is_none_or(|offset| offset % component != 0);
        if accessor.byte_offset % component != 0 || misaligned {
            report.push(
                IssueKind::AccessorOffsetAlignment,
                format!("{pointer}/byteOffset"),
                format!(
                    "offset {} (view offset {}) is not a multiple of component size {component}",
                    accessor.byte_offset, view.byte_offset
                ),
            );
        }

        match accessor.extent_in_view(view.byte_stride) {
            Some(extent) if extent <= view.byte_length => {}
            Some(extent) => report.push(
                IssueKind::AccessorOutOfBounds,
                format!("{pointer}/count"),
                format!(
                    "accessor needs {extent} bytes but buffer view {view_index} is {} bytes long",
                    view.byte_length
                ),
            ),
            None => report.push(
                IssueKind::AccessorOutOfBounds,
                format!("{pointer}/count"),
                format!(
                    "accessor extent of {} elements overflows the address space",
                    accessor.count
                ),
            ),
        }
    }
}

fn check_sparse(
    document: &Document,
    accessor: &Accessor,
    sparse: &SparseAccessor,
    pointer: &str,
    report: &mut IssueReport,
) {
    let view_count = document.buffer_views.len();
    let blocks = [
        ("indices", sparse.indices.buffer_view, sparse.indices_extent()),
        ("values", sparse.values.buffer_view, sparse.values_extent(accessor.element_size())),
    ];
    for (block, view_index, extent) in blocks {
        let Some(view) = document.buffer_views.get(view_index) else {
            report.check_index(
                format!("{pointer}/sparse/{block}/bufferView"),
                view_index,
                view_count,
                "buffer view",
            );
            continue;
        };
        match extent {
            Some(extent) if extent <= view.byte_length => {}
            Some(extent) => report.push(
                IssueKind::AccessorOutOfBounds,
                format!("{pointer}/sparse/{block}"),
                format!(
                    "sparse {block} need {extent} bytes but buffer view {view_index} has {}",
                    view.byte_length
                ),
            ),
            None => report.push(
                IssueKind::AccessorOutOfBounds,
                format!("{pointer}/sparse/{block}"),
                format!("sparse {block} for {} entries overflow the address space", sparse.count),
            ),
        }
    }
}

fn check_buffers(document: &Document, report: &mut IssueReport) {
    let mut referenced = vec![false; document.buffers.len()];
    for (index, view) in document.buffer_views.iter().enumerate() {
        let pointer = format!("/bufferViews/{index}");
        let Some(buffer) = document.buffers.get(view.buffer) else {
            report.check_index(
                format!("{pointer}/buffer"),
                view.buffer,
                document.buffers.len(),
                "buffer",
            );
            continue;
        };
        referenced[view.buffer] = true;
        let end = view.byte_offset.saturating_add(view.byte_length);
        if end > buffer.byte_length {
            report.push(
                IssueKind::BufferViewOutOfBounds,
                format!("{pointer}/byteLength"),
                format!(
                    "view ends at byte {end} but buffer {} is {} bytes long",
                    view.buffer, buffer.byte_length
                ),
            );
        }
    }

    for (index, buffer) in document.buffers.iter().enumerate() {
        if !referenced[index] {
            continue;
        }
        let loaded = buffer.data.as_ref().map_or(0, |data| data.len());
        if loaded < buffer.byte_length {
            report.push(
                IssueKind::BufferMissingData,
                format!("/buffers/{index}"),
                match &buffer.uri {
                    Some(uri) if buffer.data.is_none() => {
                        format!("external buffer '{uri}' is not loaded")
                    }
                    _ => format!(
                        "buffer declares {} bytes but only {loaded} are present",
                        buffer.byte_length
                    ),
                },
            );
        }
    }
}

/// `PREFIX_name`: an upper-case alphanumeric vendor prefix, an underscore,
/// then a non-empty name.
fn is_valid_extension_name(name: &str) -> bool {
    let Some((prefix, rest)) = name.split_once('_') else {
        return false;
    };
    !prefix.is_empty()
        && prefix
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        && !rest.is_empty()
        && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_extension_names(document: &Document, report: &mut IssueReport) {
    for (index, name) in document.extensions_used.iter().enumerate() {
        if !is_valid_extension_name(name) {
            report.push(
                IssueKind::InvalidExtensionNameFormat,
                format!("/extensionsUsed/{index}"),
                format!("extension name '{name}' does not follow the PREFIX_name convention"),
            );
        }
    }
}

// ─── Policy ───────────────────────────────────────────────────────────────────

pub(crate) fn apply_settings(
    issues: Vec<ValidationIssue>,
    settings: &CodecSettings,
) -> Vec<ValidationIssue> {
    issues
        .into_iter()
        .filter(|issue| {
            settings.report_missing_optional_bones || issue.code != IssueKind::MissingOptionalBone
        })
        .filter(|issue| {
            issue.severity == Severity::Error || !settings.suppressed_warnings.contains(&issue.code)
        })
        .map(|mut issue| {
            if settings.warnings_as_errors {
                issue.severity = Severity::Error;
            }
            issue
        })
        .collect()
}

/// Run every check against `document` and return every issue found, before
/// any settings are applied.
pub fn collect_issues(document: &Document, registry: &ExtensionRegistry) -> IssueReport {
    let graph = NodeGraph::build(&document.nodes);
    let mut report = IssueReport::new();

    check_scenes(document, &mut report);
    check_nodes(document, &graph, &mut report);
    check_meshes(document, &mut report);
    check_materials(document, &mut report);
    check_textures_and_images(document, &mut report);
    check_skins_and_animations(document, &mut report);
    check_accessors(document, &mut report);
    check_buffers(document, &mut report);
    check_extension_names(document, &mut report);

    if let Some(generation) = document.generation() {
        for schema in registry.for_generation(generation) {
            schema.validate(document, &graph, &mut report);
        }
    }
    report
}

/// Validate `document`. Any error-level issue (after `settings`) rejects the
/// document and the full issue list is returned.
pub fn validate(
    document: &Document,
    registry: &ExtensionRegistry,
    settings: &CodecSettings,
) -> Result<ValidatedDocument, Vec<ValidationIssue>> {
    let report = collect_issues(document, registry);
    let canonical = to_canonical(document);

    let issues = apply_settings(report.into_issues(), settings);
    let errors = issues
        .iter()
        .filter(|issue| issue.severity == Severity::Error)
        .count();
    log_info!(
        "validation finished: {errors} error(s), {} warning(s)",
        issues.len() - errors
    );

    if errors > 0 {
        for issue in issues.iter().filter(|issue| issue.severity == Severity::Error) {
            log_debug!("{issue}");
        }
        return Err(issues);
    }

    Ok(ValidatedDocument {
        document: document.clone(),
        canonical,
        warnings: issues,
    })
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::document::{
        Accessor, Buffer, BufferView, ComponentType, ElementType, Image, Node, SparseAccessor,
        SparseIndices, SparseValues,
    };
    use crate::fixtures;

    fn issues_of(document: &Document) -> IssueReport {
        collect_issues(document, &ExtensionRegistry::default())
    }

    #[test]
    fn given_two_nodes_parenting_each_other_when_validating_then_cycle_is_rejected() {
        let document = Document {
            nodes: vec![
                Node {
                    children: vec![1],
                    ..Default::default()
                },
                Node {
                    children: vec![0],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let issues = validate(&document, &ExtensionRegistry::default(), &CodecSettings::default())
            .expect_err("cyclic graph");

        assert!(issues.iter().any(|issue| issue.code == IssueKind::CyclicNodeGraph
            && issue.severity == Severity::Error));
    }

    #[test]
    fn given_accessor_past_view_end_when_validating_then_out_of_bounds_is_reported() {
        let mut document = fixtures::plain_document();
        document.accessors[0].count += 1;

        let report = issues_of(&document);

        assert_eq!(report.count(IssueKind::AccessorOutOfBounds), 1);
        assert_eq!(report.issues()[0].pointer, "/accessors/0/count");
    }

    #[test]
    fn given_fixture_accessors_when_validating_then_every_accessor_fits_its_view() {
        let document = fixtures::plain_document();
        for accessor in &document.accessors {
            let view = &document.buffer_views[accessor.buffer_view.unwrap_or_default()];
            let extent = accessor.extent_in_view(view.byte_stride);
            assert!(extent.is_some_and(|extent| extent <= view.byte_length));
        }
        assert!(!issues_of(&document).has_errors());
    }

    #[test]
    fn given_misaligned_float_accessor_when_validating_then_alignment_is_reported() {
        let document = Document {
            buffers: vec![Buffer {
                byte_length: 16,
                data: Some(Bytes::from(vec![0u8; 16])),
                ..Default::default()
            }],
            buffer_views: vec![BufferView {
                byte_length: 16,
                ..Default::default()
            }],
            accessors: vec![Accessor {
                buffer_view: Some(0),
                byte_offset: 2,
                ..Accessor::new(ComponentType::F32, ElementType::Scalar, 1)
            }],
            ..Default::default()
        };

        assert!(issues_of(&document).contains(IssueKind::AccessorOffsetAlignment));
    }

    fn single_view_document(accessor: Accessor) -> Document {
        Document {
            buffers: vec![Buffer {
                byte_length: 16,
                data: Some(Bytes::from(vec![0u8; 16])),
                ..Default::default()
            }],
            buffer_views: vec![
                BufferView {
                    byte_length: 16,
                    ..Default::default()
                },
                BufferView {
                    byte_length: 4,
                    ..Default::default()
                },
            ],
            accessors: vec![accessor],
            ..Default::default()
        }
    }

    #[test]
    fn given_accessor_count_overflowing_usize_when_validating_then_out_of_bounds_is_reported() {
        let document = single_view_document(Accessor {
            buffer_view: Some(0),
            ..Accessor::new(ComponentType::F32, ElementType::Vec4, 1 << 62)
        });

        let report = issues_of(&document);
        assert_eq!(report.count(IssueKind::AccessorOutOfBounds), 1);
        assert!(report.issues().iter().any(|issue| issue.pointer == "/accessors/0/count"));
    }

    #[test]
    fn given_accessor_offset_near_usize_max_when_validating_then_errors_are_reported() {
        let document = single_view_document(Accessor {
            buffer_view: Some(0),
            byte_offset: usize::MAX - 3,
            ..Accessor::new(ComponentType::F32, ElementType::Scalar, 2)
        });

        let report = issues_of(&document);
        assert!(report.contains(IssueKind::AccessorOutOfBounds));
        assert!(report.has_errors());
    }

    #[test]
    fn given_sparse_blocks_past_their_views_when_validating_then_both_are_out_of_bounds() {
        let document = single_view_document(Accessor {
            sparse: Some(SparseAccessor {
                count: 100,
                indices: SparseIndices {
                    buffer_view: 1,
                    byte_offset: 0,
                    component_type: ComponentType::U16,
                },
                values: SparseValues {
                    buffer_view: 1,
                    byte_offset: 0,
                },
            }),
            ..Accessor::new(ComponentType::F32, ElementType::Vec3, 100)
        });

        let report = issues_of(&document);
        assert_eq!(report.count(IssueKind::AccessorOutOfBounds), 2);
        for block in ["indices", "values"] {
            let pointer = format!("/accessors/0/sparse/{block}");
            assert!(report.issues().iter().any(|issue| issue.pointer == pointer));
        }
    }

    #[test]
    fn given_sparse_count_overflowing_usize_when_validating_then_no_panic_and_out_of_bounds() {
        let document = single_view_document(Accessor {
            sparse: Some(SparseAccessor {
                count: usize::MAX / 2,
                indices: SparseIndices {
                    buffer_view: 1,
                    byte_offset: 0,
                    component_type: ComponentType::U32,
                },
                values: SparseValues {
                    buffer_view: 0,
                    byte_offset: 0,
                },
            }),
            ..Accessor::new(ComponentType::F32, ElementType::Vec3, 1)
        });

        assert_eq!(issues_of(&document).count(IssueKind::AccessorOutOfBounds), 2);
    }

    #[test]
    fn given_png_bytes_declared_as_jpeg_when_validating_then_mime_mismatch_is_a_warning() {
        let png_magic = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec();
        let length = png_magic.len();
        let document = Document {
            buffers: vec![Buffer {
                byte_length: length,
                data: Some(Bytes::from(png_magic)),
                ..Default::default()
            }],
            buffer_views: vec![BufferView {
                byte_length: length,
                ..Default::default()
            }],
            images: vec![Image {
                buffer_view: Some(0),
                mime_type: Some("image/jpeg".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };

        let report = issues_of(&document);
        assert!(report.contains(IssueKind::ImageMimeTypeMismatch));
        assert!(!report.has_errors());
    }

    #[test]
    fn given_vrm_extension_name_when_validating_then_only_a_warning_is_reported() {
        assert!(is_valid_extension_name("VRMC_vrm"));
        assert!(is_valid_extension_name("KHR_materials_unlit"));
        assert!(!is_valid_extension_name("VRM"));
        assert!(!is_valid_extension_name("vrm_lower"));

        let document = Document {
            extensions_used: vec!["VRM".to_string()],
            ..Default::default()
        };
        let report = issues_of(&document);
        assert!(report.contains(IssueKind::InvalidExtensionNameFormat));
        assert!(!report.has_errors());
    }

    #[test]
    fn given_vrm0_fixture_with_shared_node_when_validating_then_one_duplicate_names_both_roles() {
        let mut document = fixtures::vrm0_document();
        if let Some(vrm) = document.vrm0_mut() {
            for bone in &mut vrm.humanoid.human_bones {
                if bone.bone == crate::vrm::HumanBone::Hips {
                    bone.node = fixtures::SPINE;
                }
            }
        }

        let issues = validate(&document, &ExtensionRegistry::default(), &CodecSettings::default())
            .expect_err("duplicate assignment");

        let duplicates: Vec<_> = issues
            .iter()
            .filter(|issue| issue.code == IssueKind::DuplicateBoneAssignment)
            .collect();
        assert_eq!(duplicates.len(), 1);
        assert!(duplicates[0].message.contains(&format!("node {}", fixtures::SPINE)));
        assert!(duplicates[0].message.contains("hips"));
        assert!(duplicates[0].message.contains("spine"));
    }

    #[test]
    fn given_settings_when_applying_then_warnings_are_filtered_or_promoted() {
        let mut report = IssueReport::new();
        report.push(IssueKind::MultipleExtensions, "/materials/0", "unlit");
        report.push(IssueKind::MissingOptionalBone, "/humanoid", "jaw");
        report.push(IssueKind::UnresolvedReference, "/nodes/0/mesh", "missing");

        let quiet = CodecSettings {
            suppressed_warnings: vec![
                IssueKind::MultipleExtensions,
                IssueKind::UnresolvedReference,
            ],
            report_missing_optional_bones: false,
            ..Default::default()
        };
        let filtered = apply_settings(report.issues().to_vec(), &quiet);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].code, IssueKind::UnresolvedReference);

        let strict = CodecSettings {
            warnings_as_errors: true,
            ..Default::default()
        };
        let promoted = apply_settings(report.into_issues(), &strict);
        assert!(promoted.iter().all(|issue| issue.severity == Severity::Error));
    }

    #[test]
    fn given_valid_vrm1_fixture_when_validating_then_document_is_accepted() {
        let document = fixtures::vrm1_document();

        let registry = ExtensionRegistry::default();
        let validated = validate(&document, &registry, &CodecSettings::default())
            .expect("fixture is valid");

        assert!(validated.warnings.iter().all(|issue| issue.severity == Severity::Warning));
        assert!(validated.canonical.avatar.is_some());
    }
}
