use std::{fs, path::Path};

use anyhow::Context;
use bytes::Bytes;
use nalgebra::{Matrix4, Point3};
use serde::Serialize;

use crate::decode::decode_bytes;
use crate::document::{Document, MODE_TRIANGLES, SpecGeneration};
use crate::encode::{EncodeOptions, NodeSelection, encode};
use crate::error::{Result, VrmError};
use crate::logging::ResultExt;
use crate::normalize::{from_canonical, to_canonical};
use crate::registry::ExtensionRegistry;
use crate::settings::CodecSettings;
use crate::validate::{
    IssueReport, NodeGraph, Severity, ValidatedDocument, ValidationIssue, apply_settings,
    collect_issues, validate,
};
use crate::vrm::humanoid::required_bones;
use crate::{log_info, log_warn};

/// Summary of a VRM file, produced without rejecting it.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub generation: Option<SpecGeneration>,
    pub model_name: String,
    pub authors: Vec<String>,
    pub node_count: usize,
    pub mesh_count: usize,
    pub material_count: usize,
    pub texture_count: usize,
    pub expression_count: usize,
    pub total_vertices: usize,
    pub total_polygons: usize,
    /// Vertical extent of the posed meshes, from the `POSITION` bounds.
    pub estimated_height_cm: Option<f32>,
    pub mapped_bones: Vec<(String, usize)>,
    pub missing_required_bones: Vec<String>,
    pub issues: Vec<ValidationIssue>,
}

impl AnalysisReport {
    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|issue| issue.severity == Severity::Error)
            .count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Target generation. Falls back to [`CodecSettings::export_generation`].
    pub generation: Option<SpecGeneration>,
    pub selection: NodeSelection,
}

#[derive(Debug, Clone)]
pub struct Exported {
    pub bytes: Vec<u8>,
    pub generation: Option<SpecGeneration>,
    /// Warnings of the written document, migration losses included.
    pub warnings: Vec<ValidationIssue>,
}

/// Registry and settings bundled for the decode → validate → encode round.
#[derive(Default)]
pub struct Codec {
    registry: ExtensionRegistry,
    settings: CodecSettings,
}

fn geometry_totals(document: &Document) -> (usize, usize) {
    let count_of = |accessor: Option<usize>| {
        accessor
            .and_then(|index| document.accessors.get(index))
            .map_or(0, |accessor| accessor.count)
    };

    let mut vertices: usize = 0;
    let mut polygons: usize = 0;
    for primitive in document.meshes.iter().flat_map(|mesh| &mesh.primitives) {
        let positions = count_of(primitive.attributes.get("POSITION").copied());
        vertices = vertices.saturating_add(positions);
        if primitive.mode == MODE_TRIANGLES {
            let triangles = match primitive.indices {
                Some(_) => count_of(primitive.indices) / 3,
                None => positions / 3,
            };
            polygons = polygons.saturating_add(triangles);
        }
    }
    (vertices, polygons)
}

fn world_matrix(document: &Document, graph: &NodeGraph, node: usize) -> Matrix4<f32> {
    let mut matrix = Matrix4::identity();
    let mut current = Some(node);
    let mut depth = 0;
    while let Some(index) = current {
        let Some(entry) = document.nodes.get(index) else {
            break;
        };
        if depth > document.nodes.len() {
            break;
        }
        matrix = entry.transform.local_matrix() * matrix;
        current = graph.parent(index);
        depth += 1;
    }
    matrix
}

fn estimate_height_cm(document: &Document) -> Option<f32> {
    let graph = NodeGraph::build(&document.nodes);
    let mut min_y = f32::INFINITY;
    let mut max_y = f32::NEG_INFINITY;

    for (index, node) in document.nodes.iter().enumerate() {
        let Some(mesh) = node.mesh.and_then(|mesh| document.meshes.get(mesh)) else {
            continue;
        };
        let world = world_matrix(document, &graph, index);
        for primitive in &mesh.primitives {
            let Some(accessor) = primitive
                .attributes
                .get("POSITION")
                .and_then(|&accessor| document.accessors.get(accessor))
            else {
                continue;
            };
            if accessor.min.len() < 3 || accessor.max.len() < 3 {
                continue;
            }
            for corner in 0..8usize {
                let pick = |bit: usize, axis: usize| {
                    (if corner & bit == 0 {
                        accessor.min[axis]
                    } else {
                        accessor.max[axis]
                    }) as f32
                };
                let point =
                    world.transform_point(&Point3::new(pick(1, 0), pick(2, 1), pick(4, 2)));
                min_y = min_y.min(point.y);
                max_y = max_y.max(point.y);
            }
        }
    }

    if min_y.is_finite() && max_y.is_finite() {
        Some((max_y - min_y).abs() * 100.0)
    } else {
        None
    }
}

impl Codec {
    pub fn new(settings: CodecSettings) -> Self {
        Self::with_registry(ExtensionRegistry::default(), settings)
    }

    pub fn with_registry(registry: ExtensionRegistry, settings: CodecSettings) -> Self {
        Self { registry, settings }
    }

    pub fn settings(&self) -> &CodecSettings {
        &self.settings
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    pub fn decode_bytes(&self, bytes: impl Into<Bytes>) -> Result<Document> {
        decode_bytes(bytes, &self.registry)
    }

    /// Decode and summarise. Validation issues are reported, not raised;
    /// only an undecodable file is an error.
    pub fn analyze(&self, bytes: impl Into<Bytes>) -> Result<AnalysisReport> {
        let document = self.decode_bytes(bytes)?;
        let issues = apply_settings(
            collect_issues(&document, &self.registry).into_issues(),
            &self.settings,
        );
        let canonical = to_canonical(&document);
        let (total_vertices, total_polygons) = geometry_totals(&document);

        let (model_name, authors, mapped_bones, missing_required_bones, expression_count) =
            match (&canonical.avatar, document.generation()) {
                (Some(avatar), Some(generation)) => (
                    avatar.meta.name.clone(),
                    avatar.meta.authors.clone(),
                    avatar
                        .humanoid
                        .iter()
                        .map(|(bone, &node)| (bone.as_str().to_string(), node))
                        .collect::<Vec<_>>(),
                    required_bones(generation)
                        .iter()
                        .filter(|&&bone| !avatar.humanoid.contains_key(&bone))
                        .map(|bone| bone.as_str().to_string())
                        .collect::<Vec<_>>(),
                    avatar.expressions.len(),
                ),
                _ => (
                    "Unknown".to_string(),
                    Vec::new(),
                    Vec::new(),
                    Vec::new(),
                    0,
                ),
            };

        Ok(AnalysisReport {
            generation: document.generation(),
            model_name,
            authors,
            node_count: document.nodes.len(),
            mesh_count: document.meshes.len(),
            material_count: document.materials.len(),
            texture_count: document.textures.len(),
            expression_count,
            total_vertices,
            total_polygons,
            estimated_height_cm: estimate_height_cm(&document),
            mapped_bones,
            missing_required_bones,
            issues,
        })
    }

    /// Decode and validate. A rejected document becomes [`VrmError::Validation`].
    pub fn import(&self, bytes: impl Into<Bytes>) -> Result<ValidatedDocument> {
        let document = self
            .decode_bytes(bytes)
            .log_error(Some("failed to decode VRM container"))?;
        let validated =
            validate(&document, &self.registry, &self.settings).map_err(VrmError::Validation)?;
        log_info!(
            "imported {} document: {} nodes, {} warning(s)",
            document.generation().map_or("glTF", SpecGeneration::as_str),
            validated.document.nodes.len(),
            validated.warnings.len()
        );
        Ok(validated)
    }

    /// Lower into another generation and validate the result.
    fn convert(
        &self,
        validated: &ValidatedDocument,
        target: SpecGeneration,
    ) -> Result<ValidatedDocument> {
        let mut report = IssueReport::new();
        let document = from_canonical(&validated.canonical, target, &mut report);
        let losses = apply_settings(report.into_issues(), &self.settings);
        if losses.iter().any(|issue| issue.severity == Severity::Error) {
            return Err(VrmError::Validation(losses));
        }
        for loss in &losses {
            log_warn!("{loss}");
        }

        let mut converted =
            validate(&document, &self.registry, &self.settings).map_err(VrmError::Validation)?;
        converted.warnings.extend(losses);
        Ok(converted)
    }

    /// Encode `validated` as GLB, converting generation first when asked to.
    pub fn export(
        &self,
        validated: &ValidatedDocument,
        options: &ExportOptions,
    ) -> Result<Exported> {
        let source = validated.document.generation();
        let converted;
        let validated = match (options.generation, source) {
            (Some(_), None) => {
                return Err(VrmError::encoding(
                    "/extensions",
                    "document has no VRM block to convert",
                ));
            }
            (Some(target), Some(source)) if target != source => {
                converted = self.convert(validated, target)?;
                &converted
            }
            (None, Some(source)) => match self.settings.export_generation {
                Some(target) if target != source => {
                    converted = self.convert(validated, target)?;
                    &converted
                }
                _ => validated,
            },
            _ => validated,
        };

        let encoded = encode(
            validated,
            &self.registry,
            &EncodeOptions {
                selection: options.selection.clone(),
            },
        )
        .log_error(Some("failed to encode VRM document"))?;
        let bytes = encoded.to_glb()?;
        let generation = validated.document.generation();
        log_info!(
            "exported {} document: {} bytes",
            generation.map_or("glTF", SpecGeneration::as_str),
            bytes.len()
        );
        Ok(Exported {
            bytes,
            generation,
            warnings: validated.warnings.clone(),
        })
    }

    // ─── Path helpers ─────────────────────────────────────────────────────────

    pub fn analyze_path(&self, path: &Path) -> anyhow::Result<AnalysisReport> {
        let bytes = fs::read(path)
            .with_context(|| format!("failed to read VRM file: {}", path.display()))?;
        let report = self
            .analyze(bytes)
            .with_context(|| format!("failed to decode VRM file: {}", path.display()))?;
        Ok(report)
    }

    pub fn import_path(&self, path: &Path) -> anyhow::Result<ValidatedDocument> {
        let bytes = fs::read(path)
            .with_context(|| format!("failed to read VRM file: {}", path.display()))?;
        let validated = self
            .import(bytes)
            .with_context(|| format!("failed to import VRM file: {}", path.display()))?;
        Ok(validated)
    }

    pub fn export_path(
        &self,
        validated: &ValidatedDocument,
        path: &Path,
        options: &ExportOptions,
    ) -> anyhow::Result<Exported> {
        let exported = self
            .export(validated, options)
            .context("failed to encode VRM document")?;
        fs::write(path, &exported.bytes)
            .with_context(|| format!("failed to write VRM file: {}", path.display()))?;
        Ok(exported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::validate::IssueKind;
    use crate::vrm::humanoid::HumanBone;

    fn glb_of(document: &Document) -> Vec<u8> {
        let registry = ExtensionRegistry::default();
        let validated =
            validate(document, &registry, &CodecSettings::default()).expect("fixture validates");
        encode(&validated, &registry, &EncodeOptions::default())
            .and_then(|encoded| encoded.to_glb())
            .expect("fixture encodes")
    }

    #[test]
    fn given_vrm0_file_when_analyzing_then_summary_matches_fixture() {
        let codec = Codec::default();
        let report = codec
            .analyze(glb_of(&fixtures::vrm0_document()))
            .expect("analysis succeeds");

        assert_eq!(report.generation, Some(SpecGeneration::Vrm0));
        assert_eq!(report.model_name, "Fixture");
        assert_eq!(report.authors, vec!["tester".to_string()]);
        assert_eq!(report.mapped_bones.len(), 17);
        assert!(report.missing_required_bones.is_empty());
        assert_eq!(report.mesh_count, 1);
        assert_eq!(report.total_vertices, 3);
        assert_eq!(report.total_polygons, 1);
        let height = report.estimated_height_cm.expect("mesh has bounds");
        assert!((height - 100.0).abs() < 1e-3);
        assert_eq!(report.expression_count, 1);
        assert_eq!(report.error_count(), 0);
    }

    #[test]
    fn given_translated_parent_when_estimating_height_then_world_transform_is_applied() {
        let mut document = fixtures::plain_document();
        document.nodes[0].transform = crate::document::Transform::Trs {
            translation: [0.0, 5.0, 0.0],
            rotation: [0.0, 0.0, 0.7071068, 0.7071068],
            scale: [2.0; 3],
        };

        // A quarter turn about Z maps the unit X extent of the triangle onto Y.
        let height = estimate_height_cm(&document).expect("mesh has bounds");
        assert!((height - 200.0).abs() < 1e-2);
    }

    #[test]
    fn given_duplicate_bone_when_analyzing_and_importing_then_only_import_fails() {
        let mut document = fixtures::vrm1_document();
        if let Some(vrm) = document.vrm1_mut() {
            vrm.humanoid.insert(HumanBone::Hips, fixtures::SPINE);
        }
        let bytes = glb_of(&fixtures::vrm1_document());
        let broken = {
            let registry = ExtensionRegistry::default();
            crate::encode::encode_document(&document, &registry, &EncodeOptions::default())
                .and_then(|encoded| encoded.to_glb())
                .expect("encoding does not validate")
        };
        let codec = Codec::default();

        let report = codec.analyze(broken.clone()).expect("analysis never rejects");
        assert!(report.issues.iter().any(|issue| issue.code == IssueKind::DuplicateBoneAssignment));

        let err = codec.import(broken).expect_err("duplicate bone is an error");
        assert!(matches!(err, VrmError::Validation(issues) if !issues.is_empty()));
        assert!(codec.import(bytes).is_ok());
    }

    #[test]
    fn given_vrm0_document_when_exporting_as_vrm1_then_output_is_a_vrm1_file() {
        let codec = Codec::default();
        let validated = codec
            .import(glb_of(&fixtures::vrm0_document()))
            .expect("fixture imports");

        let exported = codec
            .export(
                &validated,
                &ExportOptions {
                    generation: Some(SpecGeneration::Vrm1),
                    ..Default::default()
                },
            )
            .expect("conversion succeeds");
        let document = codec.decode_bytes(exported.bytes).expect("output decodes");

        assert_eq!(exported.generation, Some(SpecGeneration::Vrm1));
        let vrm = document.vrm1().expect("1.0 block");
        assert_eq!(vrm.humanoid.get(&HumanBone::Hips), Some(&fixtures::HIPS));
        assert!(!document.extensions_used.iter().any(|name| name == "VRM"));
    }

    #[test]
    fn given_constraints_when_exporting_as_vrm0_then_losses_are_returned_as_warnings() {
        let codec = Codec::new(CodecSettings {
            export_generation: Some(SpecGeneration::Vrm0),
            ..Default::default()
        });
        let validated = codec
            .import(glb_of(&fixtures::vrm1_document()))
            .expect("fixture imports");

        let exported = codec
            .export(&validated, &ExportOptions::default())
            .expect("conversion succeeds");

        assert_eq!(exported.generation, Some(SpecGeneration::Vrm0));
        assert!(exported
            .warnings
            .iter()
            .any(|issue| issue.code == IssueKind::MigrationLoss));
    }

    #[test]
    fn given_warnings_as_errors_when_conversion_loses_data_then_export_is_refused() {
        let codec = Codec::new(CodecSettings {
            warnings_as_errors: true,
            ..Default::default()
        });
        let validated = validate(
            &fixtures::vrm1_document(),
            codec.registry(),
            &CodecSettings::default(),
        )
        .expect("fixture validates");

        let err = codec
            .export(
                &validated,
                &ExportOptions {
                    generation: Some(SpecGeneration::Vrm0),
                    ..Default::default()
                },
            )
            .expect_err("losses are promoted to errors");

        assert!(matches!(err, VrmError::Validation(_)));
    }

    #[test]
    fn given_plain_gltf_when_asking_for_vrm_then_export_is_rejected() {
        let codec = Codec::default();
        let validated = codec
            .import(glb_of(&fixtures::plain_document()))
            .expect("plain glTF imports");

        let err = codec
            .export(
                &validated,
                &ExportOptions {
                    generation: Some(SpecGeneration::Vrm1),
                    ..Default::default()
                },
            )
            .expect_err("no avatar to convert");
        assert!(matches!(err, VrmError::EncodingConstraintViolation { .. }));

        let exported = codec
            .export(&validated, &ExportOptions::default())
            .expect("plain export");
        assert_eq!(exported.generation, None);
    }

    #[test]
    fn given_missing_file_when_analyzing_path_then_context_names_the_path() {
        let path = std::env::temp_dir().join("vrm_codec_missing_input.vrm");

        let err = Codec::default()
            .analyze_path(&path)
            .expect_err("file does not exist");

        assert!(format!("{err:#}").contains("vrm_codec_missing_input.vrm"));
    }

    #[test]
    fn given_positions_with_huge_counts_when_totalling_geometry_then_totals_saturate() {
        let mut document = fixtures::plain_document();
        document.accessors[0].count = usize::MAX;
        let primitive = document.meshes[0].primitives[0].clone();
        document.meshes[0].primitives.push(primitive);

        let (vertices, polygons) = geometry_totals(&document);
        assert_eq!(vertices, usize::MAX);
        assert_eq!(polygons, 2);
    }
}
