//! Wire shape of the VRM 1.0 extensions: `VRMC_vrm` and `VRMC_springBone`.

use std::collections::BTreeMap;

use super::humanoid::HumanBone;

#[derive(Debug, Clone, PartialEq)]
pub struct Vrm1 {
    pub spec_version: String,
    pub meta: Meta,
    pub humanoid: BTreeMap<HumanBone, usize>,
    pub first_person: Vec<FirstPersonAnnotation>,
    pub look_at: Option<LookAt>,
    pub expressions: Expressions,
    /// `VRMC_springBone`, when present.
    pub spring_bone: Option<SpringBone>,
}

impl Default for Vrm1 {
    fn default() -> Self {
        Self {
            spec_version: "1.0".to_string(),
            meta: Meta::default(),
            humanoid: BTreeMap::new(),
            first_person: Vec::new(),
            look_at: None,
            expressions: Expressions::default(),
            spring_bone: None,
        }
    }
}

// ─── Meta ─────────────────────────────────────────────────────────────────────

pub const VRM_LICENSE_URL: &str = "https://vrm.dev/licenses/1.0/";

#[derive(Debug, Clone, PartialEq)]
pub struct Meta {
    pub name: String,
    pub version: Option<String>,
    pub authors: Vec<String>,
    pub copyright_information: Option<String>,
    pub contact_information: Option<String>,
    pub references: Vec<String>,
    pub third_party_licenses: Option<String>,
    /// Thumbnail as an image index.
    pub thumbnail_image: Option<usize>,
    pub license_url: String,
    pub avatar_permission: String,
    pub allow_excessively_violent_usage: bool,
    pub allow_excessively_sexual_usage: bool,
    pub commercial_usage: String,
    pub allow_political_or_religious_usage: bool,
    pub allow_antisocial_or_hate_usage: bool,
    pub credit_notation: String,
    pub allow_redistribution: bool,
    pub modification: String,
    pub other_license_url: Option<String>,
}

impl Default for Meta {
    fn default() -> Self {
        Self {
            name: String::new(),
            version: None,
            authors: Vec::new(),
            copyright_information: None,
            contact_information: None,
            references: Vec::new(),
            third_party_licenses: None,
            thumbnail_image: None,
            license_url: VRM_LICENSE_URL.to_string(),
            avatar_permission: "onlyAuthor".to_string(),
            allow_excessively_violent_usage: false,
            allow_excessively_sexual_usage: false,
            commercial_usage: "personalNonProfit".to_string(),
            allow_political_or_religious_usage: false,
            allow_antisocial_or_hate_usage: false,
            credit_notation: "required".to_string(),
            allow_redistribution: false,
            modification: "prohibited".to_string(),
            other_license_url: None,
        }
    }
}

// ─── First person / look-at ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FirstPersonType {
    #[default]
    Auto,
    Both,
    ThirdPersonOnly,
    FirstPersonOnly,
}

impl FirstPersonType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "auto" => Some(FirstPersonType::Auto),
            "both" => Some(FirstPersonType::Both),
            "thirdPersonOnly" => Some(FirstPersonType::ThirdPersonOnly),
            "firstPersonOnly" => Some(FirstPersonType::FirstPersonOnly),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FirstPersonType::Auto => "auto",
            FirstPersonType::Both => "both",
            FirstPersonType::ThirdPersonOnly => "thirdPersonOnly",
            FirstPersonType::FirstPersonOnly => "firstPersonOnly",
        }
    }

    /// 0.x spells the same flags in PascalCase.
    pub fn from_vrm0_flag(flag: &str) -> Self {
        match flag {
            "Both" => FirstPersonType::Both,
            "ThirdPersonOnly" => FirstPersonType::ThirdPersonOnly,
            "FirstPersonOnly" => FirstPersonType::FirstPersonOnly,
            _ => FirstPersonType::Auto,
        }
    }

    pub fn vrm0_flag(self) -> &'static str {
        match self {
            FirstPersonType::Auto => "Auto",
            FirstPersonType::Both => "Both",
            FirstPersonType::ThirdPersonOnly => "ThirdPersonOnly",
            FirstPersonType::FirstPersonOnly => "FirstPersonOnly",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FirstPersonAnnotation {
    pub node: usize,
    pub kind: FirstPersonType,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeMap {
    pub input_max_value: f32,
    pub output_scale: f32,
}

impl Default for RangeMap {
    fn default() -> Self {
        Self {
            input_max_value: 90.0,
            output_scale: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LookAtType {
    #[default]
    Bone,
    Expression,
}

impl LookAtType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "bone" => Some(LookAtType::Bone),
            "expression" => Some(LookAtType::Expression),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LookAtType::Bone => "bone",
            LookAtType::Expression => "expression",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LookAt {
    pub offset_from_head_bone: [f32; 3],
    pub kind: LookAtType,
    pub range_map_horizontal_inner: RangeMap,
    pub range_map_horizontal_outer: RangeMap,
    pub range_map_vertical_down: RangeMap,
    pub range_map_vertical_up: RangeMap,
}

impl Default for LookAt {
    fn default() -> Self {
        Self {
            offset_from_head_bone: [0.0, 0.06, 0.0],
            kind: LookAtType::Bone,
            range_map_horizontal_inner: RangeMap::default(),
            range_map_horizontal_outer: RangeMap::default(),
            range_map_vertical_down: RangeMap::default(),
            range_map_vertical_up: RangeMap::default(),
        }
    }
}

// ─── Expressions ──────────────────────────────────────────────────────────────

macro_rules! expression_presets {
    ($($variant:ident => $name:literal, $vrm0:expr);+ $(;)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum ExpressionPreset {
            $($variant),+
        }

        impl ExpressionPreset {
            pub const ALL: &'static [ExpressionPreset] = &[$(ExpressionPreset::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(ExpressionPreset::$variant => $name),+
                }
            }

            pub fn parse(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(ExpressionPreset::$variant),)+
                    _ => None,
                }
            }

            /// The 0.x `presetName`, if 0.x has an equivalent.
            pub fn vrm0_name(self) -> Option<&'static str> {
                match self {
                    $(ExpressionPreset::$variant => $vrm0),+
                }
            }
        }
    };
}

expression_presets! {
    Happy => "happy", Some("joy");
    Angry => "angry", Some("angry");
    Sad => "sad", Some("sorrow");
    Relaxed => "relaxed", Some("fun");
    Surprised => "surprised", None;
    Aa => "aa", Some("a");
    Ih => "ih", Some("i");
    Ou => "ou", Some("u");
    Ee => "ee", Some("e");
    Oh => "oh", Some("o");
    Blink => "blink", Some("blink");
    BlinkLeft => "blinkLeft", Some("blink_l");
    BlinkRight => "blinkRight", Some("blink_r");
    LookUp => "lookUp", Some("lookup");
    LookDown => "lookDown", Some("lookdown");
    LookLeft => "lookLeft", Some("lookleft");
    LookRight => "lookRight", Some("lookright");
    Neutral => "neutral", Some("neutral");
}

impl ExpressionPreset {
    pub fn from_vrm0_name(name: &str) -> Option<Self> {
        ExpressionPreset::ALL
            .iter()
            .copied()
            .find(|preset| preset.vrm0_name() == Some(name))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExpressionOverride {
    #[default]
    None,
    Block,
    Blend,
}

impl ExpressionOverride {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "none" => Some(ExpressionOverride::None),
            "block" => Some(ExpressionOverride::Block),
            "blend" => Some(ExpressionOverride::Blend),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExpressionOverride::None => "none",
            ExpressionOverride::Block => "block",
            ExpressionOverride::Blend => "blend",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MorphTargetBind {
    pub node: usize,
    pub index: usize,
    /// 0..1.
    pub weight: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialColorType {
    Color,
    EmissionColor,
    ShadeColor,
    MatcapColor,
    RimColor,
    OutlineColor,
}

impl MaterialColorType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "color" => Some(MaterialColorType::Color),
            "emissionColor" => Some(MaterialColorType::EmissionColor),
            "shadeColor" => Some(MaterialColorType::ShadeColor),
            "matcapColor" => Some(MaterialColorType::MatcapColor),
            "rimColor" => Some(MaterialColorType::RimColor),
            "outlineColor" => Some(MaterialColorType::OutlineColor),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MaterialColorType::Color => "color",
            MaterialColorType::EmissionColor => "emissionColor",
            MaterialColorType::ShadeColor => "shadeColor",
            MaterialColorType::MatcapColor => "matcapColor",
            MaterialColorType::RimColor => "rimColor",
            MaterialColorType::OutlineColor => "outlineColor",
        }
    }

    /// Unity shader property carrying the same colour in 0.x material values.
    pub fn vrm0_property(self) -> Option<&'static str> {
        match self {
            MaterialColorType::Color => Some("_Color"),
            MaterialColorType::EmissionColor => Some("_EmissionColor"),
            MaterialColorType::ShadeColor => Some("_ShadeColor"),
            MaterialColorType::RimColor => Some("_RimColor"),
            MaterialColorType::OutlineColor => Some("_OutlineColor"),
            MaterialColorType::MatcapColor => None,
        }
    }

    pub fn from_vrm0_property(property: &str) -> Option<Self> {
        match property {
            "_Color" => Some(MaterialColorType::Color),
            "_EmissionColor" => Some(MaterialColorType::EmissionColor),
            "_ShadeColor" => Some(MaterialColorType::ShadeColor),
            "_RimColor" => Some(MaterialColorType::RimColor),
            "_OutlineColor" => Some(MaterialColorType::OutlineColor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialColorBind {
    pub material: usize,
    pub kind: MaterialColorType,
    pub target_value: [f32; 4],
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureTransformBind {
    pub material: usize,
    pub scale: [f32; 2],
    pub offset: [f32; 2],
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expression {
    pub morph_target_binds: Vec<MorphTargetBind>,
    pub material_color_binds: Vec<MaterialColorBind>,
    pub texture_transform_binds: Vec<TextureTransformBind>,
    pub is_binary: bool,
    pub override_blink: ExpressionOverride,
    pub override_look_at: ExpressionOverride,
    pub override_mouth: ExpressionOverride,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expressions {
    pub preset: BTreeMap<ExpressionPreset, Expression>,
    pub custom: BTreeMap<String, Expression>,
}

// ─── Spring bone ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ColliderShape {
    Sphere {
        offset: [f32; 3],
        radius: f32,
    },
    Capsule {
        offset: [f32; 3],
        radius: f32,
        tail: [f32; 3],
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Collider {
    pub node: usize,
    pub shape: ColliderShape,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColliderGroup {
    pub name: Option<String>,
    pub colliders: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpringJoint {
    pub node: usize,
    pub hit_radius: f32,
    pub stiffness: f32,
    pub gravity_power: f32,
    pub gravity_dir: [f32; 3],
    pub drag_force: f32,
}

impl SpringJoint {
    pub fn new(node: usize) -> Self {
        Self {
            node,
            hit_radius: 0.0,
            stiffness: 1.0,
            gravity_power: 0.0,
            gravity_dir: [0.0, -1.0, 0.0],
            drag_force: 0.5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Spring {
    pub name: Option<String>,
    pub joints: Vec<SpringJoint>,
    pub collider_groups: Vec<usize>,
    pub center: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpringBone {
    pub spec_version: String,
    pub colliders: Vec<Collider>,
    pub collider_groups: Vec<ColliderGroup>,
    pub springs: Vec<Spring>,
}

impl Default for SpringBone {
    fn default() -> Self {
        Self {
            spec_version: "1.0".to_string(),
            colliders: Vec::new(),
            collider_groups: Vec::new(),
            springs: Vec::new(),
        }
    }
}
