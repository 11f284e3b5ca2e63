//! Generation-neutral view of a VRM document.
//!
//! [`to_canonical`] lifts either wire generation into an [`Avatar`];
//! [`from_canonical`] lowers it into the requested generation. Anything the
//! target cannot express is reported as `MIGRATION_LOSS` rather than failing.

mod expression;
mod meta;
mod mtoon;
mod spring;
mod view;

use std::collections::BTreeMap;

use crate::document::{Document, SpecGeneration, VrmExtension};
use crate::validate::{IssueKind, IssueReport, ValidationIssue};
use crate::vrm::humanoid::HumanBone;
use crate::vrm::vrm0::{Vrm0, Vrm0HumanBone, Vrm0Humanoid};
use crate::vrm::{Avatar, Vrm1};
use crate::log_debug;

const EXPORTER: &str = concat!("vrm-codec-", env!("CARGO_PKG_VERSION"));

/// Core glTF graph plus the avatar lifted out of its VRM block.
///
/// `document.vrm` is always `None`; MToon parameters live on the materials
/// and node constraints on the nodes, whichever generation they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalDocument {
    pub document: Document,
    pub source: Option<SpecGeneration>,
    pub avatar: Option<Avatar>,
    /// What lifting from `source` could not carry over. Reported when the
    /// avatar is lowered into the other generation.
    pub losses: Vec<ValidationIssue>,
}

pub(crate) fn migration_loss(
    report: &mut IssueReport,
    pointer: impl Into<String>,
    message: impl Into<String>,
) {
    report.push(IssueKind::MigrationLoss, pointer, message);
}

// ─── Lifting ──────────────────────────────────────────────────────────────────

fn avatar_from_vrm1(vrm: &Vrm1) -> Avatar {
    Avatar {
        meta: vrm.meta.clone(),
        humanoid: vrm.humanoid.clone(),
        first_person: vrm.first_person.clone(),
        look_at: vrm.look_at.clone().unwrap_or_default(),
        expressions: expression::expressions_from_vrm1(&vrm.expressions),
        spring_bone: vrm.spring_bone.clone().unwrap_or_default(),
    }
}

fn humanoid_from_vrm0(
    humanoid: &Vrm0Humanoid,
    report: &mut IssueReport,
) -> BTreeMap<HumanBone, usize> {
    let mut bones = BTreeMap::new();
    for bone in &humanoid.human_bones {
        bones.entry(bone.bone).or_insert(bone.node);
    }

    let defaults = Vrm0Humanoid::default();
    let tuned = Vrm0Humanoid {
        human_bones: Vec::new(),
        ..humanoid.clone()
    };
    if tuned != defaults {
        migration_loss(
            report,
            "/extensions/VRM/humanoid",
            "muscle and twist settings have no 1.0 equivalent",
        );
    }
    bones
}

fn avatar_from_vrm0(vrm: &Vrm0, document: &mut Document, report: &mut IssueReport) -> Avatar {
    for material in &mut document.materials {
        let Some(name) = &material.name else {
            continue;
        };
        let props = vrm
            .material_properties
            .iter()
            .find(|props| &props.name == name && mtoon::is_mtoon(props));
        if let Some(props) = props {
            material.mtoon = Some(mtoon::mtoon_from_vrm0(props));
        }
    }

    let humanoid = humanoid_from_vrm0(&vrm.humanoid, report);
    Avatar {
        meta: meta::meta_from_vrm0(&vrm.meta, document, report),
        first_person: view::first_person_from_vrm0(&vrm.first_person, document, report),
        look_at: view::look_at_from_vrm0(&vrm.first_person, &humanoid, report),
        expressions: expression::expressions_from_vrm0(&vrm.blend_shape_master, document, report),
        spring_bone: spring::spring_bone_from_vrm0(&vrm.secondary_animation, document, report),
        humanoid,
    }
}

/// Lift `document` into canonical form.
pub fn to_canonical(document: &Document) -> CanonicalDocument {
    let mut report = IssueReport::new();
    let mut core = Document {
        vrm: None,
        ..document.clone()
    };
    let avatar = match &document.vrm {
        None => None,
        Some(VrmExtension::Vrm1(vrm)) => Some(avatar_from_vrm1(vrm)),
        Some(VrmExtension::Vrm0(vrm)) => Some(avatar_from_vrm0(vrm, &mut core, &mut report)),
    };
    CanonicalDocument {
        document: core,
        source: document.generation(),
        avatar,
        losses: report.into_issues(),
    }
}

// ─── Lowering ─────────────────────────────────────────────────────────────────

fn vrm1_from_avatar(avatar: &Avatar) -> Vrm1 {
    let spring_bone = &avatar.spring_bone;
    let has_springs = !spring_bone.colliders.is_empty()
        || !spring_bone.collider_groups.is_empty()
        || !spring_bone.springs.is_empty();
    Vrm1 {
        meta: avatar.meta.clone(),
        humanoid: avatar.humanoid.clone(),
        first_person: avatar.first_person.clone(),
        look_at: Some(avatar.look_at.clone()),
        expressions: expression::expressions_to_vrm1(&avatar.expressions),
        spring_bone: has_springs.then(|| spring_bone.clone()),
        ..Default::default()
    }
}

fn vrm0_from_avatar(avatar: &Avatar, document: &mut Document, report: &mut IssueReport) -> Vrm0 {
    for (index, node) in document.nodes.iter_mut().enumerate() {
        if node.constraint.take().is_some() {
            migration_loss(
                report,
                format!("/nodes/{index}/extensions/VRMC_node_constraint"),
                "node constraints have no 0.x equivalent",
            );
        }
    }

    let mut material_properties = Vec::with_capacity(document.materials.len());
    for (index, material) in document.materials.iter_mut().enumerate() {
        let name = material
            .name
            .get_or_insert_with(|| format!("material_{index}"))
            .clone();
        material_properties.push(mtoon::properties_to_vrm0(material, &name));
        material.mtoon = None;
    }

    let human_bones = avatar
        .humanoid
        .iter()
        .map(|(&bone, &node)| Vrm0HumanBone {
            bone,
            node,
            use_default_values: true,
        })
        .collect();

    Vrm0 {
        exporter_version: Some(EXPORTER.to_string()),
        spec_version: Some("0.0".to_string()),
        meta: meta::meta_to_vrm0(&avatar.meta, document, report),
        humanoid: Vrm0Humanoid {
            human_bones,
            ..Default::default()
        },
        first_person: view::first_person_to_vrm0(
            &avatar.first_person,
            &avatar.look_at,
            &avatar.humanoid,
            document,
            report,
        ),
        blend_shape_master: expression::expressions_to_vrm0(&avatar.expressions, document, report),
        secondary_animation: spring::spring_bone_to_vrm0(&avatar.spring_bone, report),
        material_properties,
    }
}

/// Lower a canonical document into the `target` generation's wire shape.
/// A document without an avatar stays plain glTF. Losses from lifting and
/// lowering are pushed to `report` when the generation changes.
pub fn from_canonical(
    canonical: &CanonicalDocument,
    target: SpecGeneration,
    report: &mut IssueReport,
) -> Document {
    let mut document = canonical.document.clone();
    let Some(avatar) = &canonical.avatar else {
        return document;
    };

    if canonical.source != Some(target) {
        report.extend(canonical.losses.iter().cloned());
    }
    log_debug!(
        "lowering avatar from {} to {}",
        canonical.source.map_or("glTF", SpecGeneration::as_str),
        target.as_str()
    );
    document.vrm = Some(match target {
        SpecGeneration::Vrm1 => VrmExtension::Vrm1(Box::new(vrm1_from_avatar(avatar))),
        SpecGeneration::Vrm0 => {
            VrmExtension::Vrm0(Box::new(vrm0_from_avatar(avatar, &mut document, report)))
        }
    });
    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::vrm::vrm1::ExpressionPreset;

    #[test]
    fn given_vrm1_document_when_lifting_and_lowering_then_block_is_unchanged() {
        let document = fixtures::vrm1_document();
        let mut report = IssueReport::new();

        let canonical = to_canonical(&document);
        let lowered = from_canonical(&canonical, SpecGeneration::Vrm1, &mut report);

        assert!(canonical.document.vrm.is_none());
        assert_eq!(canonical.source, Some(SpecGeneration::Vrm1));
        assert_eq!(lowered, document);
        assert!(report.is_empty());
    }

    #[test]
    fn given_vrm0_document_when_converting_to_vrm1_then_humanoid_and_presets_carry_over() {
        let document = fixtures::vrm0_document();
        let mut report = IssueReport::new();

        let canonical = to_canonical(&document);
        let lowered = from_canonical(&canonical, SpecGeneration::Vrm1, &mut report);
        let vrm = lowered.vrm1().expect("1.0 block");

        assert_eq!(vrm.humanoid.get(&HumanBone::Hips), Some(&fixtures::HIPS));
        assert!(vrm.expressions.preset.contains_key(&ExpressionPreset::Blink));
        assert_eq!(vrm.meta.name, "Fixture");
        let spring = &vrm.spring_bone.as_ref().expect("springs").springs[0];
        assert_eq!(spring.joints[0].node, fixtures::HAIR_ROOT);
        assert_eq!(spring.joints.len(), 2);
        assert!(!report.has_errors());
    }

    #[test]
    fn given_constrained_node_when_lowering_to_vrm0_then_constraint_is_dropped_with_loss() {
        let document = fixtures::vrm1_document();
        let mut report = IssueReport::new();
        let canonical = to_canonical(&document);
        assert!(canonical.document.nodes.iter().any(|node| node.constraint.is_some()));

        let lowered = from_canonical(&canonical, SpecGeneration::Vrm0, &mut report);

        assert!(lowered.nodes.iter().all(|node| node.constraint.is_none()));
        assert!(lowered.materials.iter().all(|material| material.mtoon.is_none()));
        let vrm = lowered.vrm0().expect("0.x block");
        assert_eq!(vrm.material_properties.len(), lowered.materials.len());
        assert!(report.contains(IssueKind::MigrationLoss));
    }

    #[test]
    fn given_plain_gltf_when_lowering_then_no_vrm_block_is_added() {
        let document = fixtures::plain_document();
        let mut report = IssueReport::new();

        let canonical = to_canonical(&document);
        let lowered = from_canonical(&canonical, SpecGeneration::Vrm0, &mut report);

        assert!(canonical.avatar.is_none());
        assert_eq!(lowered, document);
    }
}
