//! Strongly typed glTF document graph.
//!
//! Every cross-entity reference is an index into one of the [`Document`]
//! sequences, exactly as on the wire. Nothing here checks that the indices
//! resolve; that is the validator's job.

mod accessor;

use std::collections::BTreeMap;

use bytes::Bytes;
use nalgebra::{Matrix4, Quaternion, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::vrm::{NodeConstraint, Vrm0, Vrm1, mtoon::MToon};

pub use accessor::{
    Accessor, ComponentType, ElementType, SparseAccessor, SparseIndices, SparseValues,
    element_size,
};

/// Extension objects kept verbatim, keyed by extension name.
pub type ExtensionMap = BTreeMap<String, Value>;

/// VRM specification generation a document was authored against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SpecGeneration {
    #[serde(rename = "0.x")]
    Vrm0,
    #[serde(rename = "1.0")]
    Vrm1,
}

impl SpecGeneration {
    pub fn as_str(self) -> &'static str {
        match self {
            SpecGeneration::Vrm0 => "0.x",
            SpecGeneration::Vrm1 => "1.0",
        }
    }
}

/// The VRM extension block, in the wire shape of its generation.
#[derive(Debug, Clone, PartialEq)]
pub enum VrmExtension {
    Vrm0(Box<Vrm0>),
    Vrm1(Box<Vrm1>),
}

impl VrmExtension {
    pub fn empty(generation: SpecGeneration) -> Self {
        match generation {
            SpecGeneration::Vrm0 => VrmExtension::Vrm0(Box::default()),
            SpecGeneration::Vrm1 => VrmExtension::Vrm1(Box::default()),
        }
    }

    pub fn generation(&self) -> SpecGeneration {
        match self {
            VrmExtension::Vrm0(_) => SpecGeneration::Vrm0,
            VrmExtension::Vrm1(_) => SpecGeneration::Vrm1,
        }
    }
}

// ─── Scene graph ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub version: String,
    pub generator: Option<String>,
    pub copyright: Option<String>,
    pub min_version: Option<String>,
}

impl Default for Asset {
    fn default() -> Self {
        Self {
            version: "2.0".to_string(),
            generator: None,
            copyright: None,
            min_version: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub name: Option<String>,
    pub nodes: Vec<usize>,
    pub extras: Option<Value>,
}

/// Local transform of a node: either decomposed TRS or a column-major matrix.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    Trs {
        translation: [f32; 3],
        rotation: [f32; 4],
        scale: [f32; 3],
    },
    Matrix([f32; 16]),
}

impl Default for Transform {
    fn default() -> Self {
        Transform::Trs {
            translation: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0; 3],
        }
    }
}

impl Transform {
    /// Build the local transform matrix (T * R * S for decomposed transforms).
    pub fn local_matrix(&self) -> Matrix4<f32> {
        match self {
            Transform::Matrix(values) => Matrix4::from_column_slice(values),
            Transform::Trs {
                translation,
                rotation,
                scale,
            } => {
                let translation =
                    Translation3::from(Vector3::new(translation[0], translation[1], translation[2]))
                        .to_homogeneous();
                let rotation = UnitQuaternion::from_quaternion(Quaternion::new(
                    rotation[3],
                    rotation[0],
                    rotation[1],
                    rotation[2],
                ))
                .to_homogeneous();
                let scale =
                    Matrix4::new_nonuniform_scaling(&Vector3::new(scale[0], scale[1], scale[2]));
                translation * rotation * scale
            }
        }
    }

    /// Length of the stored rotation quaternion, if this is a TRS transform.
    pub fn rotation_norm(&self) -> Option<f32> {
        match self {
            Transform::Trs { rotation, .. } => {
                Some(Quaternion::new(rotation[3], rotation[0], rotation[1], rotation[2]).norm())
            }
            Transform::Matrix(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    pub name: Option<String>,
    pub children: Vec<usize>,
    pub mesh: Option<usize>,
    pub skin: Option<usize>,
    pub camera: Option<usize>,
    pub transform: Transform,
    pub weights: Vec<f32>,
    /// `VRMC_node_constraint` payload (1.0 only).
    pub constraint: Option<NodeConstraint>,
    pub extensions: ExtensionMap,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CameraProjection {
    Perspective {
        yfov: f32,
        znear: f32,
        zfar: Option<f32>,
        aspect_ratio: Option<f32>,
    },
    Orthographic {
        xmag: f32,
        ymag: f32,
        znear: f32,
        zfar: f32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub name: Option<String>,
    pub projection: CameraProjection,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Skin {
    pub name: Option<String>,
    pub inverse_bind_matrices: Option<usize>,
    pub skeleton: Option<usize>,
    pub joints: Vec<usize>,
    pub extras: Option<Value>,
}

// ─── Geometry ─────────────────────────────────────────────────────────────────

pub const MODE_TRIANGLES: u32 = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    /// Attribute semantic (`POSITION`, `NORMAL`, `TEXCOORD_0`, `JOINTS_0`, ...) to accessor.
    pub attributes: BTreeMap<String, usize>,
    pub indices: Option<usize>,
    pub material: Option<usize>,
    pub mode: u32,
    /// Morph targets, each mapping a semantic to an accessor.
    pub targets: Vec<BTreeMap<String, usize>>,
    pub extensions: ExtensionMap,
    pub extras: Option<Value>,
}

impl Default for Primitive {
    fn default() -> Self {
        Self {
            attributes: BTreeMap::new(),
            indices: None,
            material: None,
            mode: MODE_TRIANGLES,
            targets: Vec::new(),
            extensions: ExtensionMap::new(),
            extras: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub name: Option<String>,
    pub primitives: Vec<Primitive>,
    pub weights: Vec<f32>,
    pub extensions: ExtensionMap,
    pub extras: Option<Value>,
}

impl Mesh {
    /// Morph target count of the mesh: the largest target list of any primitive.
    pub fn morph_target_count(&self) -> usize {
        self.primitives
            .iter()
            .map(|primitive| primitive.targets.len())
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BufferView {
    pub name: Option<String>,
    pub buffer: usize,
    pub byte_offset: usize,
    pub byte_length: usize,
    pub byte_stride: Option<usize>,
    pub target: Option<u32>,
}

/// Raw binary payload. `data` is present for the GLB BIN chunk and for
/// decoded `data:` URIs; external URIs are left unresolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Buffer {
    pub name: Option<String>,
    pub byte_length: usize,
    pub uri: Option<String>,
    pub data: Option<Bytes>,
}

// ─── Materials and textures ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextureInfo {
    pub index: usize,
    pub tex_coord: u32,
    pub extensions: ExtensionMap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalTextureInfo {
    pub info: TextureInfo,
    pub scale: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OcclusionTextureInfo {
    pub info: TextureInfo,
    pub strength: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PbrMetallicRoughness {
    pub base_color_factor: [f32; 4],
    pub base_color_texture: Option<TextureInfo>,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub metallic_roughness_texture: Option<TextureInfo>,
}

impl Default for PbrMetallicRoughness {
    fn default() -> Self {
        Self {
            base_color_factor: [1.0; 4],
            base_color_texture: None,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            metallic_roughness_texture: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AlphaMode {
    #[default]
    Opaque,
    Mask,
    Blend,
}

impl AlphaMode {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "OPAQUE" => Some(AlphaMode::Opaque),
            "MASK" => Some(AlphaMode::Mask),
            "BLEND" => Some(AlphaMode::Blend),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlphaMode::Opaque => "OPAQUE",
            AlphaMode::Mask => "MASK",
            AlphaMode::Blend => "BLEND",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: Option<String>,
    pub pbr: PbrMetallicRoughness,
    pub normal_texture: Option<NormalTextureInfo>,
    pub occlusion_texture: Option<OcclusionTextureInfo>,
    pub emissive_texture: Option<TextureInfo>,
    pub emissive_factor: [f32; 3],
    pub alpha_mode: AlphaMode,
    pub alpha_cutoff: f32,
    pub double_sided: bool,
    /// Toon shading parameters (`VRMC_materials_mtoon`, or migrated 0.x properties).
    pub mtoon: Option<MToon>,
    pub extensions: ExtensionMap,
    pub extras: Option<Value>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: None,
            pbr: PbrMetallicRoughness::default(),
            normal_texture: None,
            occlusion_texture: None,
            emissive_texture: None,
            emissive_factor: [0.0; 3],
            alpha_mode: AlphaMode::Opaque,
            alpha_cutoff: 0.5,
            double_sided: false,
            mtoon: None,
            extensions: ExtensionMap::new(),
            extras: None,
        }
    }
}

impl Material {
    /// Every texture index this material refers to, core and MToon alike.
    pub fn texture_indices(&self) -> Vec<usize> {
        let mut indices = Vec::new();
        indices.extend(self.pbr.base_color_texture.as_ref().map(|info| info.index));
        indices.extend(
            self.pbr
                .metallic_roughness_texture
                .as_ref()
                .map(|info| info.index),
        );
        indices.extend(self.normal_texture.as_ref().map(|info| info.info.index));
        indices.extend(self.occlusion_texture.as_ref().map(|info| info.info.index));
        indices.extend(self.emissive_texture.as_ref().map(|info| info.index));
        if let Some(mtoon) = &self.mtoon {
            indices.extend(mtoon.texture_indices());
        }
        indices
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Texture {
    pub name: Option<String>,
    pub sampler: Option<usize>,
    pub source: Option<usize>,
    pub extensions: ExtensionMap,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Image {
    pub name: Option<String>,
    pub uri: Option<String>,
    pub mime_type: Option<String>,
    pub buffer_view: Option<usize>,
}

pub const WRAP_REPEAT: u32 = 10497;

#[derive(Debug, Clone, PartialEq)]
pub struct Sampler {
    pub name: Option<String>,
    pub mag_filter: Option<u32>,
    pub min_filter: Option<u32>,
    pub wrap_s: u32,
    pub wrap_t: u32,
}

impl Default for Sampler {
    fn default() -> Self {
        Self {
            name: None,
            mag_filter: None,
            min_filter: None,
            wrap_s: WRAP_REPEAT,
            wrap_t: WRAP_REPEAT,
        }
    }
}

// ─── Animation ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationTarget {
    pub node: Option<usize>,
    /// `translation`, `rotation`, `scale` or `weights`.
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationChannel {
    pub sampler: usize,
    pub target: AnimationTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationSampler {
    pub input: usize,
    pub output: usize,
    pub interpolation: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Animation {
    pub name: Option<String>,
    pub channels: Vec<AnimationChannel>,
    pub samplers: Vec<AnimationSampler>,
    pub extras: Option<Value>,
}

// ─── Root ─────────────────────────────────────────────────────────────────────

/// A fully owned glTF document plus its optional VRM block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub asset: Asset,
    pub scene: Option<usize>,
    pub scenes: Vec<Scene>,
    pub nodes: Vec<Node>,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub textures: Vec<Texture>,
    pub images: Vec<Image>,
    pub samplers: Vec<Sampler>,
    pub accessors: Vec<Accessor>,
    pub buffer_views: Vec<BufferView>,
    pub buffers: Vec<Buffer>,
    pub animations: Vec<Animation>,
    pub skins: Vec<Skin>,
    pub cameras: Vec<Camera>,
    pub extensions_used: Vec<String>,
    pub extensions_required: Vec<String>,
    /// Root-level extensions not owned by a registered schema.
    pub extensions: ExtensionMap,
    pub extras: Option<Value>,
    pub vrm: Option<VrmExtension>,
}

impl Document {
    pub fn generation(&self) -> Option<SpecGeneration> {
        self.vrm.as_ref().map(VrmExtension::generation)
    }

    pub fn vrm0(&self) -> Option<&Vrm0> {
        match &self.vrm {
            Some(VrmExtension::Vrm0(vrm)) => Some(vrm),
            _ => None,
        }
    }

    pub fn vrm0_mut(&mut self) -> Option<&mut Vrm0> {
        match &mut self.vrm {
            Some(VrmExtension::Vrm0(vrm)) => Some(vrm),
            _ => None,
        }
    }

    pub fn vrm1(&self) -> Option<&Vrm1> {
        match &self.vrm {
            Some(VrmExtension::Vrm1(vrm)) => Some(vrm),
            _ => None,
        }
    }

    pub fn vrm1_mut(&mut self) -> Option<&mut Vrm1> {
        match &mut self.vrm {
            Some(VrmExtension::Vrm1(vrm)) => Some(vrm),
            _ => None,
        }
    }

    /// First node that instantiates `mesh`, used when a bind names a mesh rather than a node.
    pub fn first_node_with_mesh(&self, mesh: usize) -> Option<usize> {
        self.nodes.iter().position(|node| node.mesh == Some(mesh))
    }

    /// Index of the first material with the given name.
    pub fn material_by_name(&self, name: &str) -> Option<usize> {
        self.materials
            .iter()
            .position(|material| material.name.as_deref() == Some(name))
    }

    /// Bytes covered by a buffer view, if the backing buffer data is loaded and large enough.
    pub fn buffer_view_bytes(&self, view: usize) -> Option<Bytes> {
        let view = self.buffer_views.get(view)?;
        let data = self.buffers.get(view.buffer)?.data.as_ref()?;
        let end = view.byte_offset.checked_add(view.byte_length)?;
        (end <= data.len()).then(|| data.slice(view.byte_offset..end))
    }
}
