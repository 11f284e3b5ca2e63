use crate::document::SpecGeneration;

macro_rules! human_bones {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Standard humanoid bone vocabulary, named as in VRM 1.0.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum HumanBone {
            $($variant),+
        }

        impl HumanBone {
            pub const ALL: &'static [HumanBone] = &[$(HumanBone::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(HumanBone::$variant => $name),+
                }
            }

            pub fn parse(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(HumanBone::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

human_bones! {
    Hips => "hips",
    Spine => "spine",
    Chest => "chest",
    UpperChest => "upperChest",
    Neck => "neck",
    Head => "head",
    LeftEye => "leftEye",
    RightEye => "rightEye",
    Jaw => "jaw",
    LeftUpperLeg => "leftUpperLeg",
    LeftLowerLeg => "leftLowerLeg",
    LeftFoot => "leftFoot",
    LeftToes => "leftToes",
    RightUpperLeg => "rightUpperLeg",
    RightLowerLeg => "rightLowerLeg",
    RightFoot => "rightFoot",
    RightToes => "rightToes",
    LeftShoulder => "leftShoulder",
    LeftUpperArm => "leftUpperArm",
    LeftLowerArm => "leftLowerArm",
    LeftHand => "leftHand",
    RightShoulder => "rightShoulder",
    RightUpperArm => "rightUpperArm",
    RightLowerArm => "rightLowerArm",
    RightHand => "rightHand",
    LeftThumbMetacarpal => "leftThumbMetacarpal",
    LeftThumbProximal => "leftThumbProximal",
    LeftThumbDistal => "leftThumbDistal",
    LeftIndexProximal => "leftIndexProximal",
    LeftIndexIntermediate => "leftIndexIntermediate",
    LeftIndexDistal => "leftIndexDistal",
    LeftMiddleProximal => "leftMiddleProximal",
    LeftMiddleIntermediate => "leftMiddleIntermediate",
    LeftMiddleDistal => "leftMiddleDistal",
    LeftRingProximal => "leftRingProximal",
    LeftRingIntermediate => "leftRingIntermediate",
    LeftRingDistal => "leftRingDistal",
    LeftLittleProximal => "leftLittleProximal",
    LeftLittleIntermediate => "leftLittleIntermediate",
    LeftLittleDistal => "leftLittleDistal",
    RightThumbMetacarpal => "rightThumbMetacarpal",
    RightThumbProximal => "rightThumbProximal",
    RightThumbDistal => "rightThumbDistal",
    RightIndexProximal => "rightIndexProximal",
    RightIndexIntermediate => "rightIndexIntermediate",
    RightIndexDistal => "rightIndexDistal",
    RightMiddleProximal => "rightMiddleProximal",
    RightMiddleIntermediate => "rightMiddleIntermediate",
    RightMiddleDistal => "rightMiddleDistal",
    RightRingProximal => "rightRingProximal",
    RightRingIntermediate => "rightRingIntermediate",
    RightRingDistal => "rightRingDistal",
    RightLittleProximal => "rightLittleProximal",
    RightLittleIntermediate => "rightLittleIntermediate",
    RightLittleDistal => "rightLittleDistal",
}

// ─── Required bone sets ───────────────────────────────────────────────────────

/// Bones a VRM 1.0 humanoid must assign.
pub const REQUIRED_BONES_VRM1: [HumanBone; 15] = [
    HumanBone::Hips,
    HumanBone::Spine,
    HumanBone::Head,
    HumanBone::LeftUpperLeg,
    HumanBone::LeftLowerLeg,
    HumanBone::LeftFoot,
    HumanBone::RightUpperLeg,
    HumanBone::RightLowerLeg,
    HumanBone::RightFoot,
    HumanBone::LeftUpperArm,
    HumanBone::LeftLowerArm,
    HumanBone::LeftHand,
    HumanBone::RightUpperArm,
    HumanBone::RightLowerArm,
    HumanBone::RightHand,
];

/// Bones a VRM 0.x humanoid must assign (the 1.0 set plus chest and neck).
pub const REQUIRED_BONES_VRM0: [HumanBone; 17] = [
    HumanBone::Hips,
    HumanBone::Spine,
    HumanBone::Chest,
    HumanBone::Neck,
    HumanBone::Head,
    HumanBone::LeftUpperLeg,
    HumanBone::LeftLowerLeg,
    HumanBone::LeftFoot,
    HumanBone::RightUpperLeg,
    HumanBone::RightLowerLeg,
    HumanBone::RightFoot,
    HumanBone::LeftUpperArm,
    HumanBone::LeftLowerArm,
    HumanBone::LeftHand,
    HumanBone::RightUpperArm,
    HumanBone::RightLowerArm,
    HumanBone::RightHand,
];

pub fn required_bones(generation: SpecGeneration) -> &'static [HumanBone] {
    match generation {
        SpecGeneration::Vrm0 => &REQUIRED_BONES_VRM0,
        SpecGeneration::Vrm1 => &REQUIRED_BONES_VRM1,
    }
}

impl HumanBone {
    pub fn is_required(self, generation: SpecGeneration) -> bool {
        required_bones(generation).contains(&self)
    }

    /// Name used by the 0.x humanoid. Only the thumb joints differ: 0.x has no
    /// metacarpal and calls the three thumb joints proximal/intermediate/distal.
    pub fn vrm0_name(self) -> &'static str {
        match self {
            HumanBone::LeftThumbMetacarpal => "leftThumbProximal",
            HumanBone::LeftThumbProximal => "leftThumbIntermediate",
            HumanBone::RightThumbMetacarpal => "rightThumbProximal",
            HumanBone::RightThumbProximal => "rightThumbIntermediate",
            other => other.as_str(),
        }
    }

    pub fn from_vrm0_name(name: &str) -> Option<Self> {
        match name {
            "leftThumbProximal" => Some(HumanBone::LeftThumbMetacarpal),
            "leftThumbIntermediate" => Some(HumanBone::LeftThumbProximal),
            "rightThumbProximal" => Some(HumanBone::RightThumbMetacarpal),
            "rightThumbIntermediate" => Some(HumanBone::RightThumbProximal),
            "leftThumbMetacarpal" | "rightThumbMetacarpal" => None,
            other => HumanBone::parse(other),
        }
    }

    /// Parent bone in the humanoid hierarchy. Bones that may be skipped
    /// (upper chest, shoulders) are still listed; callers walk up until they
    /// reach a bone that is actually assigned.
    pub fn parent(self) -> Option<HumanBone> {
        use HumanBone::*;

        let parent = match self {
            Hips => return None,
            Spine | LeftUpperLeg | RightUpperLeg => Hips,
            Chest => Spine,
            UpperChest => Chest,
            Neck | LeftShoulder | RightShoulder => UpperChest,
            Head => Neck,
            LeftEye | RightEye | Jaw => Head,
            LeftLowerLeg => LeftUpperLeg,
            LeftFoot => LeftLowerLeg,
            LeftToes => LeftFoot,
            RightLowerLeg => RightUpperLeg,
            RightFoot => RightLowerLeg,
            RightToes => RightFoot,
            LeftUpperArm => LeftShoulder,
            LeftLowerArm => LeftUpperArm,
            LeftHand => LeftLowerArm,
            RightUpperArm => RightShoulder,
            RightLowerArm => RightUpperArm,
            RightHand => RightLowerArm,
            LeftThumbMetacarpal | LeftIndexProximal | LeftMiddleProximal | LeftRingProximal
            | LeftLittleProximal => LeftHand,
            LeftThumbProximal => LeftThumbMetacarpal,
            LeftThumbDistal => LeftThumbProximal,
            LeftIndexIntermediate => LeftIndexProximal,
            LeftIndexDistal => LeftIndexIntermediate,
            LeftMiddleIntermediate => LeftMiddleProximal,
            LeftMiddleDistal => LeftMiddleIntermediate,
            LeftRingIntermediate => LeftRingProximal,
            LeftRingDistal => LeftRingIntermediate,
            LeftLittleIntermediate => LeftLittleProximal,
            LeftLittleDistal => LeftLittleIntermediate,
            RightThumbMetacarpal | RightIndexProximal | RightMiddleProximal
            | RightRingProximal | RightLittleProximal => RightHand,
            RightThumbProximal => RightThumbMetacarpal,
            RightThumbDistal => RightThumbProximal,
            RightIndexIntermediate => RightIndexProximal,
            RightIndexDistal => RightIndexIntermediate,
            RightMiddleIntermediate => RightMiddleProximal,
            RightMiddleDistal => RightMiddleIntermediate,
            RightRingIntermediate => RightRingProximal,
            RightRingDistal => RightRingIntermediate,
            RightLittleIntermediate => RightLittleProximal,
            RightLittleDistal => RightLittleIntermediate,
        };
        Some(parent)
    }
}
