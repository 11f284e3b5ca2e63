//! 0.x blend shape groups and 1.0 expressions.

use crate::document::Document;
use crate::validate::IssueReport;
use crate::vrm::AvatarExpression;
use crate::vrm::vrm0::{Vrm0BlendShapeBind, Vrm0BlendShapeGroup, Vrm0MaterialValue};
use crate::vrm::vrm1::{
    Expression, ExpressionOverride, ExpressionPreset, Expressions, MaterialColorBind,
    MaterialColorType, MorphTargetBind, TextureTransformBind,
};

use super::migration_loss;

const GROUPS_POINTER: &str = "/extensions/VRM/blendShapeMaster/blendShapeGroups";
const MAIN_TEX_ST: &str = "_MainTex_ST";

/// 0.x bind weights are percentages.
const WEIGHT_SCALE: f32 = 100.0;

// ─── 0.x → canonical ──────────────────────────────────────────────────────────

/// Unity `_ST` (scale, offset) has its V origin at the bottom; glTF at the top.
/// The conversion is its own inverse.
fn flip_st(scale: [f32; 2], offset: [f32; 2]) -> [f32; 2] {
    [offset[0], 1.0 - offset[1] - scale[1]]
}

fn color_value(values: &[f32]) -> [f32; 4] {
    let mut color = [0.0, 0.0, 0.0, 1.0];
    for (slot, value) in color.iter_mut().zip(values) {
        *slot = *value;
    }
    color
}

fn migrate_material_value(
    value: &Vrm0MaterialValue,
    pointer: String,
    document: &Document,
    expression: &mut Expression,
    report: &mut IssueReport,
) {
    let Some(material) = document.material_by_name(&value.material_name) else {
        migration_loss(
            report,
            pointer,
            format!("material '{}' does not exist", value.material_name),
        );
        return;
    };

    if value.property_name == MAIN_TEX_ST {
        let st = color_value(&value.target_value);
        let scale = [st[0], st[1]];
        expression.texture_transform_binds.push(TextureTransformBind {
            material,
            scale,
            offset: flip_st(scale, [st[2], st[3]]),
        });
    } else if let Some(kind) = MaterialColorType::from_vrm0_property(&value.property_name) {
        expression.material_color_binds.push(MaterialColorBind {
            material,
            kind,
            target_value: color_value(&value.target_value),
        });
    } else {
        migration_loss(
            report,
            pointer,
            format!("material property '{}' has no 1.0 bind", value.property_name),
        );
    }
}

fn migrate_group(
    group: &Vrm0BlendShapeGroup,
    pointer: &str,
    document: &Document,
    report: &mut IssueReport,
) -> Expression {
    let mut expression = Expression {
        is_binary: group.is_binary,
        ..Default::default()
    };

    for (index, bind) in group.binds.iter().enumerate() {
        match document.first_node_with_mesh(bind.mesh) {
            Some(node) => expression.morph_target_binds.push(MorphTargetBind {
                node,
                index: bind.index,
                weight: (bind.weight / WEIGHT_SCALE).clamp(0.0, 1.0),
            }),
            None => migration_loss(
                report,
                format!("{pointer}/binds/{index}/mesh"),
                format!("no node instantiates mesh {}", bind.mesh),
            ),
        }
    }
    for (index, value) in group.material_values.iter().enumerate() {
        migrate_material_value(
            value,
            format!("{pointer}/materialValues/{index}"),
            document,
            &mut expression,
            report,
        );
    }
    expression
}

pub(super) fn expressions_from_vrm0(
    groups: &[Vrm0BlendShapeGroup],
    document: &Document,
    report: &mut IssueReport,
) -> Vec<AvatarExpression> {
    let mut presets: Vec<AvatarExpression> = Vec::new();
    let mut custom = Vec::new();

    for (index, group) in groups.iter().enumerate() {
        let pointer = format!("{GROUPS_POINTER}/{index}");
        let expression = migrate_group(group, &pointer, document, report);
        match ExpressionPreset::from_vrm0_name(&group.preset_name.to_ascii_lowercase()) {
            Some(preset) if presets.iter().any(|existing| existing.preset == Some(preset)) => {
                migration_loss(
                    report,
                    format!("{pointer}/presetName"),
                    format!("preset '{}' is already defined", group.preset_name),
                );
            }
            Some(preset) => presets.push(AvatarExpression {
                name: preset.as_str().to_string(),
                preset: Some(preset),
                expression,
            }),
            None => {
                let name = if group.name.is_empty() {
                    format!("expression_{index}")
                } else {
                    group.name.clone()
                };
                custom.push(AvatarExpression {
                    name,
                    preset: None,
                    expression,
                });
            }
        }
    }

    presets.sort_by_key(|expression| expression.preset);
    presets.extend(custom);
    presets
}

// ─── 1.0 ↔ canonical ──────────────────────────────────────────────────────────

pub(super) fn expressions_from_vrm1(expressions: &Expressions) -> Vec<AvatarExpression> {
    let presets = expressions
        .preset
        .iter()
        .map(|(preset, expression)| AvatarExpression {
            name: preset.as_str().to_string(),
            preset: Some(*preset),
            expression: expression.clone(),
        });
    let custom = expressions
        .custom
        .iter()
        .map(|(name, expression)| AvatarExpression {
            name: name.clone(),
            preset: None,
            expression: expression.clone(),
        });
    presets.chain(custom).collect()
}

pub(super) fn expressions_to_vrm1(expressions: &[AvatarExpression]) -> Expressions {
    let mut out = Expressions::default();
    for expression in expressions {
        match expression.preset {
            Some(preset) => {
                out.preset.insert(preset, expression.expression.clone());
            }
            None => {
                out.custom
                    .insert(expression.name.clone(), expression.expression.clone());
            }
        }
    }
    out
}

// ─── canonical → 0.x ──────────────────────────────────────────────────────────

fn vrm1_pointer(expression: &AvatarExpression) -> String {
    match expression.preset {
        Some(preset) => format!("/extensions/VRMC_vrm/expressions/preset/{}", preset.as_str()),
        None => format!("/extensions/VRMC_vrm/expressions/custom/{}", expression.name),
    }
}

fn material_name(document: &Document, material: usize) -> Option<String> {
    document
        .materials
        .get(material)
        .and_then(|material| material.name.clone())
}

pub(super) fn expressions_to_vrm0(
    expressions: &[AvatarExpression],
    document: &Document,
    report: &mut IssueReport,
) -> Vec<Vrm0BlendShapeGroup> {
    let mut groups = Vec::with_capacity(expressions.len());
    for avatar_expression in expressions {
        let pointer = vrm1_pointer(avatar_expression);
        let expression = &avatar_expression.expression;

        let preset_name = match avatar_expression.preset {
            Some(preset) => match preset.vrm0_name() {
                Some(name) => name,
                None => {
                    migration_loss(
                        report,
                        pointer.clone(),
                        format!("preset '{}' has no 0.x counterpart", preset.as_str()),
                    );
                    "unknown"
                }
            },
            None => "unknown",
        };

        let overridden = [
            expression.override_blink,
            expression.override_look_at,
            expression.override_mouth,
        ]
        .into_iter()
        .any(|mode| mode != ExpressionOverride::None);
        if overridden {
            migration_loss(report, pointer.clone(), "expression overrides are dropped");
        }

        let mut binds = Vec::new();
        for (index, bind) in expression.morph_target_binds.iter().enumerate() {
            match document.nodes.get(bind.node).and_then(|node| node.mesh) {
                Some(mesh) => binds.push(Vrm0BlendShapeBind {
                    mesh,
                    index: bind.index,
                    weight: bind.weight * WEIGHT_SCALE,
                }),
                None => migration_loss(
                    report,
                    format!("{pointer}/morphTargetBinds/{index}/node"),
                    format!("node {} has no mesh", bind.node),
                ),
            }
        }

        let mut material_values = Vec::new();
        for (index, bind) in expression.material_color_binds.iter().enumerate() {
            let bind_pointer = format!("{pointer}/materialColorBinds/{index}");
            let (Some(material_name), Some(property)) =
                (material_name(document, bind.material), bind.kind.vrm0_property())
            else {
                migration_loss(
                    report,
                    bind_pointer,
                    "bind needs a named material and a 0.x color property",
                );
                continue;
            };
            material_values.push(Vrm0MaterialValue {
                material_name,
                property_name: property.to_string(),
                target_value: bind.target_value.to_vec(),
            });
        }
        for (index, bind) in expression.texture_transform_binds.iter().enumerate() {
            let Some(material_name) = material_name(document, bind.material) else {
                migration_loss(
                    report,
                    format!("{pointer}/textureTransformBinds/{index}"),
                    "bind needs a named material",
                );
                continue;
            };
            let offset = flip_st(bind.scale, bind.offset);
            material_values.push(Vrm0MaterialValue {
                material_name,
                property_name: MAIN_TEX_ST.to_string(),
                target_value: vec![bind.scale[0], bind.scale[1], offset[0], offset[1]],
            });
        }

        groups.push(Vrm0BlendShapeGroup {
            name: avatar_expression.name.clone(),
            preset_name: preset_name.to_string(),
            binds,
            material_values,
            is_binary: expression.is_binary,
        });
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Material, Node};
    use crate::validate::IssueKind;

    fn document() -> Document {
        Document {
            nodes: vec![
                Node::default(),
                Node {
                    mesh: Some(0),
                    ..Default::default()
                },
            ],
            materials: vec![Material {
                name: Some("face".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn group(preset: &str, weight: f32) -> Vrm0BlendShapeGroup {
        Vrm0BlendShapeGroup {
            name: preset.to_string(),
            preset_name: preset.to_string(),
            binds: vec![Vrm0BlendShapeBind {
                mesh: 0,
                index: 2,
                weight,
            }],
            material_values: Vec::new(),
            is_binary: false,
        }
    }

    #[test]
    fn given_percent_weights_when_migrating_then_binds_target_the_mesh_node() {
        let mut report = IssueReport::new();
        let expressions = expressions_from_vrm0(
            &[group("blink", 100.0), group("joy", 50.0)],
            &document(),
            &mut report,
        );

        assert_eq!(expressions[0].preset, Some(ExpressionPreset::Happy));
        assert_eq!(expressions[1].preset, Some(ExpressionPreset::Blink));
        let bind = &expressions[0].expression.morph_target_binds[0];
        assert_eq!((bind.node, bind.index, bind.weight), (1, 2, 0.5));
        assert!(report.is_empty());
    }

    #[test]
    fn given_unknown_preset_and_duplicate_when_migrating_then_custom_is_kept_and_duplicate_lost() {
        let mut custom = group("unknown", 10.0);
        custom.name = "wink".to_string();
        let mut report = IssueReport::new();

        let expressions = expressions_from_vrm0(
            &[group("a", 100.0), custom, group("a", 20.0)],
            &document(),
            &mut report,
        );

        assert_eq!(expressions.len(), 2);
        assert_eq!(expressions[1].name, "wink");
        assert_eq!(expressions[1].preset, None);
        assert_eq!(report.count(IssueKind::MigrationLoss), 1);
    }

    #[test]
    fn given_main_tex_st_when_migrating_both_ways_then_values_round_trip() {
        let mut source = group("fun", 100.0);
        source.material_values = vec![
            Vrm0MaterialValue {
                material_name: "face".to_string(),
                property_name: MAIN_TEX_ST.to_string(),
                target_value: vec![0.5, 0.25, 0.5, 0.0],
            },
            Vrm0MaterialValue {
                material_name: "face".to_string(),
                property_name: "_Color".to_string(),
                target_value: vec![1.0, 0.0, 0.0, 1.0],
            },
        ];
        let mut report = IssueReport::new();
        let document = document();

        let expressions = expressions_from_vrm0(&[source.clone()], &document, &mut report);
        let transform = &expressions[0].expression.texture_transform_binds[0];
        assert_eq!(transform.scale, [0.5, 0.25]);
        assert_eq!(transform.offset, [0.5, 0.75]);

        let back = expressions_to_vrm0(&expressions, &document, &mut report);
        assert_eq!(back[0].preset_name, "fun");
        assert_eq!(back[0].binds, source.binds);
        assert!(back[0].material_values.contains(&source.material_values[0]));
        assert!(back[0].material_values.contains(&source.material_values[1]));
        assert!(report.is_empty());
    }
}
