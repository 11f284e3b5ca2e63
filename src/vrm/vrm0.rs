//! Wire shape of the single flat `VRM` extension (VRM 0.x).

use std::collections::BTreeMap;

use super::humanoid::HumanBone;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vrm0 {
    pub exporter_version: Option<String>,
    pub spec_version: Option<String>,
    pub meta: Vrm0Meta,
    pub humanoid: Vrm0Humanoid,
    pub first_person: Vrm0FirstPerson,
    pub blend_shape_master: Vec<Vrm0BlendShapeGroup>,
    pub secondary_animation: Vrm0SecondaryAnimation,
    pub material_properties: Vec<Vrm0MaterialProperties>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vrm0Meta {
    pub title: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
    pub contact_information: Option<String>,
    pub reference: Option<String>,
    /// Thumbnail as a texture index.
    pub texture: Option<usize>,
    pub allowed_user_name: Option<String>,
    pub violent_ussage_name: Option<String>,
    pub sexual_ussage_name: Option<String>,
    pub commercial_ussage_name: Option<String>,
    pub other_permission_url: Option<String>,
    pub license_name: Option<String>,
    pub other_license_url: Option<String>,
}

// ─── Humanoid ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Vrm0HumanBone {
    pub bone: HumanBone,
    pub node: usize,
    pub use_default_values: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vrm0Humanoid {
    pub human_bones: Vec<Vrm0HumanBone>,
    pub arm_stretch: f32,
    pub leg_stretch: f32,
    pub upper_arm_twist: f32,
    pub lower_arm_twist: f32,
    pub upper_leg_twist: f32,
    pub lower_leg_twist: f32,
    pub feet_spacing: f32,
    pub has_translation_dof: bool,
}

impl Default for Vrm0Humanoid {
    fn default() -> Self {
        Self {
            human_bones: Vec::new(),
            arm_stretch: 0.05,
            leg_stretch: 0.05,
            upper_arm_twist: 0.5,
            lower_arm_twist: 0.5,
            upper_leg_twist: 0.5,
            lower_leg_twist: 0.5,
            feet_spacing: 0.0,
            has_translation_dof: false,
        }
    }
}

// ─── First person / look-at ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Vrm0MeshAnnotation {
    pub mesh: usize,
    /// `Auto`, `Both`, `ThirdPersonOnly` or `FirstPersonOnly`.
    pub first_person_flag: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vrm0DegreeMap {
    pub curve: Vec<f32>,
    pub x_range: f32,
    pub y_range: f32,
}

impl Default for Vrm0DegreeMap {
    fn default() -> Self {
        Self {
            curve: vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0],
            x_range: 90.0,
            y_range: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vrm0FirstPerson {
    pub first_person_bone: Option<usize>,
    pub first_person_bone_offset: [f32; 3],
    pub mesh_annotations: Vec<Vrm0MeshAnnotation>,
    /// `Bone` or `BlendShape`.
    pub look_at_type_name: String,
    pub look_at_horizontal_inner: Vrm0DegreeMap,
    pub look_at_horizontal_outer: Vrm0DegreeMap,
    pub look_at_vertical_down: Vrm0DegreeMap,
    pub look_at_vertical_up: Vrm0DegreeMap,
}

impl Default for Vrm0FirstPerson {
    fn default() -> Self {
        Self {
            first_person_bone: None,
            first_person_bone_offset: [0.0, 0.06, 0.0],
            mesh_annotations: Vec::new(),
            look_at_type_name: "Bone".to_string(),
            look_at_horizontal_inner: Vrm0DegreeMap::default(),
            look_at_horizontal_outer: Vrm0DegreeMap::default(),
            look_at_vertical_down: Vrm0DegreeMap::default(),
            look_at_vertical_up: Vrm0DegreeMap::default(),
        }
    }
}

// ─── Blend shapes ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Vrm0BlendShapeBind {
    pub mesh: usize,
    pub index: usize,
    /// 0..100.
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vrm0MaterialValue {
    pub material_name: String,
    pub property_name: String,
    pub target_value: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vrm0BlendShapeGroup {
    pub name: String,
    pub preset_name: String,
    pub binds: Vec<Vrm0BlendShapeBind>,
    pub material_values: Vec<Vrm0MaterialValue>,
    pub is_binary: bool,
}

// ─── Secondary animation ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Vrm0Collider {
    pub offset: [f32; 3],
    pub radius: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vrm0ColliderGroup {
    pub node: usize,
    pub colliders: Vec<Vrm0Collider>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vrm0BoneGroup {
    pub comment: Option<String>,
    /// Spelled `stiffiness` on the wire.
    pub stiffness: f32,
    pub gravity_power: f32,
    pub gravity_dir: [f32; 3],
    pub drag_force: f32,
    pub center: Option<usize>,
    pub hit_radius: f32,
    /// Root node of each chain.
    pub bones: Vec<usize>,
    pub collider_groups: Vec<usize>,
}

impl Default for Vrm0BoneGroup {
    fn default() -> Self {
        Self {
            comment: None,
            stiffness: 1.0,
            gravity_power: 0.0,
            gravity_dir: [0.0, -1.0, 0.0],
            drag_force: 0.4,
            center: None,
            hit_radius: 0.02,
            bones: Vec::new(),
            collider_groups: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vrm0SecondaryAnimation {
    pub bone_groups: Vec<Vrm0BoneGroup>,
    pub collider_groups: Vec<Vrm0ColliderGroup>,
}

// ─── Material properties ──────────────────────────────────────────────────────

pub const SHADER_MTOON: &str = "VRM/MToon";
pub const SHADER_GLTF: &str = "VRM_USE_GLTFSHADER";

/// Unity-style shader property dump for one material, matched by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vrm0MaterialProperties {
    pub name: String,
    pub shader: String,
    pub render_queue: i64,
    pub float_properties: BTreeMap<String, f32>,
    pub vector_properties: BTreeMap<String, Vec<f32>>,
    pub texture_properties: BTreeMap<String, usize>,
    pub keyword_map: BTreeMap<String, bool>,
    pub tag_map: BTreeMap<String, String>,
}

impl Vrm0MaterialProperties {
    pub fn float(&self, key: &str, default: f32) -> f32 {
        self.float_properties.get(key).copied().unwrap_or(default)
    }

    /// First `N` components of a vector property, padding with `default`.
    pub fn vector<const N: usize>(&self, key: &str, default: [f32; N]) -> [f32; N] {
        let Some(values) = self.vector_properties.get(key) else {
            return default;
        };
        let mut out = default;
        for (slot, value) in out.iter_mut().zip(values) {
            *slot = *value;
        }
        out
    }
}
