use bytes::Bytes;

use crate::document::{
    Accessor, AlphaMode, Animation, AnimationChannel, AnimationSampler, AnimationTarget, Asset,
    Buffer, BufferView, Camera, CameraProjection, ComponentType, ElementType, Image, Material,
    Mesh, Node, NormalTextureInfo, OcclusionTextureInfo, PbrMetallicRoughness, Primitive, Sampler,
    Scene, Skin, SparseAccessor, SparseIndices, SparseValues, Texture, TextureInfo, Transform,
    WRAP_REPEAT,
};
use crate::error::{Result, VrmError};
use crate::log_debug;

use super::data_uri::DataUri;
use super::reader::{ObjectReader, element_pointer, expect_index};

pub(super) fn decode_asset(reader: ObjectReader<'_>) -> Result<Asset> {
    Ok(Asset {
        version: reader.require_string("version")?,
        generator: reader.string("generator")?,
        copyright: reader.string("copyright")?,
        min_version: reader.string("minVersion")?,
    })
}

pub(super) fn decode_scene(reader: ObjectReader<'_>) -> Result<Scene> {
    Ok(Scene {
        name: reader.string("name")?,
        nodes: reader.indices("nodes")?,
        extras: reader.extras(),
    })
}

// ─── Nodes ────────────────────────────────────────────────────────────────────

pub(super) fn decode_node(reader: ObjectReader<'_>, owned: &[&str]) -> Result<Node> {
    let transform = if reader.contains("matrix") {
        Transform::Matrix(reader.float_array("matrix", [0.0; 16])?)
    } else {
        Transform::Trs {
            translation: reader.float_array("translation", [0.0; 3])?,
            rotation: reader.float_array("rotation", [0.0, 0.0, 0.0, 1.0])?,
            scale: reader.float_array("scale", [1.0; 3])?,
        }
    };

    Ok(Node {
        name: reader.string("name")?,
        children: reader.indices("children")?,
        mesh: reader.index("mesh")?,
        skin: reader.index("skin")?,
        camera: reader.index("camera")?,
        transform,
        weights: reader.floats("weights")?,
        constraint: None,
        extensions: reader.extensions_except(owned)?,
        extras: reader.extras(),
    })
}

pub(super) fn decode_skin(reader: ObjectReader<'_>) -> Result<Skin> {
    Ok(Skin {
        name: reader.string("name")?,
        inverse_bind_matrices: reader.index("inverseBindMatrices")?,
        skeleton: reader.index("skeleton")?,
        joints: reader.indices("joints")?,
        extras: reader.extras(),
    })
}

pub(super) fn decode_camera(reader: ObjectReader<'_>) -> Result<Camera> {
    let kind = reader.require_string("type")?;
    let projection = match kind.as_str() {
        "perspective" => {
            let child = reader.require_object("perspective")?;
            let perspective = child.reader();
            CameraProjection::Perspective {
                yfov: perspective.require_f32("yfov")?,
                znear: perspective.require_f32("znear")?,
                zfar: perspective.f32("zfar")?,
                aspect_ratio: perspective.f32("aspectRatio")?,
            }
        }
        "orthographic" => {
            let child = reader.require_object("orthographic")?;
            let orthographic = child.reader();
            CameraProjection::Orthographic {
                xmag: orthographic.require_f32("xmag")?,
                ymag: orthographic.require_f32("ymag")?,
                znear: orthographic.require_f32("znear")?,
                zfar: orthographic.require_f32("zfar")?,
            }
        }
        other => {
            return Err(VrmError::schema(
                reader.child_pointer("type"),
                "\"perspective\" or \"orthographic\"",
                other,
            ));
        }
    };

    Ok(Camera {
        name: reader.string("name")?,
        projection,
    })
}

// ─── Meshes ───────────────────────────────────────────────────────────────────

pub(super) fn decode_mesh(reader: ObjectReader<'_>) -> Result<Mesh> {
    let primitives = reader
        .objects("primitives")?
        .iter()
        .map(|primitive| decode_primitive(primitive.reader()))
        .collect::<Result<Vec<_>>>()?;

    Ok(Mesh {
        name: reader.string("name")?,
        primitives,
        weights: reader.floats("weights")?,
        extensions: reader.extensions()?,
        extras: reader.extras(),
    })
}

fn decode_primitive(reader: ObjectReader<'_>) -> Result<Primitive> {
    let targets_pointer = reader.child_pointer("targets");
    let targets = reader
        .array("targets")?
        .iter()
        .enumerate()
        .map(|(index, target)| {
            let pointer = element_pointer(&targets_pointer, index);
            ObjectReader::new(target, &pointer)?.scalar_map_all(expect_index)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Primitive {
        attributes: reader.scalar_map("attributes", expect_index)?,
        indices: reader.index("indices")?,
        material: reader.index("material")?,
        mode: reader.index_or("mode", 4)? as u32,
        targets,
        extensions: reader.extensions()?,
        extras: reader.extras(),
    })
}

// ─── Materials and textures ───────────────────────────────────────────────────

pub(crate) fn decode_texture_info(reader: ObjectReader<'_>) -> Result<TextureInfo> {
    Ok(TextureInfo {
        index: reader.require_index("index")?,
        tex_coord: reader.index_or("texCoord", 0)? as u32,
        extensions: reader.extensions()?,
    })
}

pub(crate) fn optional_texture_info(
    reader: ObjectReader<'_>,
    key: &str,
) -> Result<Option<TextureInfo>> {
    reader
        .object(key)?
        .map(|child| decode_texture_info(child.reader()))
        .transpose()
}

pub(super) fn decode_material(reader: ObjectReader<'_>, owned: &[&str]) -> Result<Material> {
    let pbr = match reader.object("pbrMetallicRoughness")? {
        Some(child) => {
            let pbr = child.reader();
            PbrMetallicRoughness {
                base_color_factor: pbr.float_array("baseColorFactor", [1.0; 4])?,
                base_color_texture: optional_texture_info(pbr, "baseColorTexture")?,
                metallic_factor: pbr.f32_or("metallicFactor", 1.0)?,
                roughness_factor: pbr.f32_or("roughnessFactor", 1.0)?,
                metallic_roughness_texture: optional_texture_info(
                    pbr,
                    "metallicRoughnessTexture",
                )?,
            }
        }
        None => PbrMetallicRoughness::default(),
    };

    let normal_texture = reader
        .object("normalTexture")?
        .map(|child| -> Result<NormalTextureInfo> {
            let texture = child.reader();
            Ok(NormalTextureInfo {
                info: decode_texture_info(texture)?,
                scale: texture.f32_or("scale", 1.0)?,
            })
        })
        .transpose()?;

    let occlusion_texture = reader
        .object("occlusionTexture")?
        .map(|child| -> Result<OcclusionTextureInfo> {
            let texture = child.reader();
            Ok(OcclusionTextureInfo {
                info: decode_texture_info(texture)?,
                strength: texture.f32_or("strength", 1.0)?,
            })
        })
        .transpose()?;

    Ok(Material {
        name: reader.string("name")?,
        pbr,
        normal_texture,
        occlusion_texture,
        emissive_texture: optional_texture_info(reader, "emissiveTexture")?,
        emissive_factor: reader.float_array("emissiveFactor", [0.0; 3])?,
        alpha_mode: reader.enumeration("alphaMode", AlphaMode::Opaque, AlphaMode::parse)?,
        alpha_cutoff: reader.f32_or("alphaCutoff", 0.5)?,
        double_sided: reader.bool_or("doubleSided", false)?,
        mtoon: None,
        extensions: reader.extensions_except(owned)?,
        extras: reader.extras(),
    })
}

pub(super) fn decode_texture(reader: ObjectReader<'_>) -> Result<Texture> {
    Ok(Texture {
        name: reader.string("name")?,
        sampler: reader.index("sampler")?,
        source: reader.index("source")?,
        extensions: reader.extensions()?,
        extras: reader.extras(),
    })
}

pub(super) fn decode_image(reader: ObjectReader<'_>) -> Result<Image> {
    Ok(Image {
        name: reader.string("name")?,
        uri: reader.string("uri")?,
        mime_type: reader.string("mimeType")?,
        buffer_view: reader.index("bufferView")?,
    })
}

pub(super) fn decode_sampler(reader: ObjectReader<'_>) -> Result<Sampler> {
    Ok(Sampler {
        name: reader.string("name")?,
        mag_filter: reader.index("magFilter")?.map(|filter| filter as u32),
        min_filter: reader.index("minFilter")?.map(|filter| filter as u32),
        wrap_s: reader.index_or("wrapS", WRAP_REPEAT as usize)? as u32,
        wrap_t: reader.index_or("wrapT", WRAP_REPEAT as usize)? as u32,
    })
}

// ─── Binary data ──────────────────────────────────────────────────────────────

fn component_type(reader: ObjectReader<'_>, key: &str) -> Result<ComponentType> {
    let code = reader.require_index(key)?;
    ComponentType::from_code(code as u64).ok_or_else(|| {
        VrmError::schema(
            reader.child_pointer(key),
            "glTF component type",
            code.to_string(),
        )
    })
}

pub(super) fn decode_accessor(reader: ObjectReader<'_>) -> Result<Accessor> {
    let element_name = reader.require_string("type")?;
    let element_type = ElementType::parse(&element_name).ok_or_else(|| {
        VrmError::schema(
            reader.child_pointer("type"),
            "accessor element type",
            element_name.clone(),
        )
    })?;

    let sparse = match reader.object("sparse")? {
        Some(child) => {
            let sparse = child.reader();
            let indices = sparse.require_object("indices")?;
            let values = sparse.require_object("values")?;
            let (indices, values) = (indices.reader(), values.reader());
            Some(SparseAccessor {
                count: sparse.require_index("count")?,
                indices: SparseIndices {
                    buffer_view: indices.require_index("bufferView")?,
                    byte_offset: indices.index_or("byteOffset", 0)?,
                    component_type: component_type(indices, "componentType")?,
                },
                values: SparseValues {
                    buffer_view: values.require_index("bufferView")?,
                    byte_offset: values.index_or("byteOffset", 0)?,
                },
            })
        }
        None => None,
    };

    Ok(Accessor {
        name: reader.string("name")?,
        buffer_view: reader.index("bufferView")?,
        byte_offset: reader.index_or("byteOffset", 0)?,
        component_type: component_type(reader, "componentType")?,
        element_type,
        count: reader.require_index("count")?,
        normalized: reader.bool_or("normalized", false)?,
        min: reader.f64s("min")?,
        max: reader.f64s("max")?,
        sparse,
        extensions: reader.extensions()?,
        extras: reader.extras(),
    })
}

pub(super) fn decode_buffer_view(reader: ObjectReader<'_>) -> Result<BufferView> {
    Ok(BufferView {
        name: reader.string("name")?,
        buffer: reader.require_index("buffer")?,
        byte_offset: reader.index_or("byteOffset", 0)?,
        byte_length: reader.require_index("byteLength")?,
        byte_stride: reader.index("byteStride")?,
        target: reader.index("target")?.map(|target| target as u32),
    })
}

/// Decode a buffer and attach its bytes: the GLB BIN chunk for an
/// URI-less first buffer, or the payload of a `data:` URI.
pub(super) fn decode_buffer(
    reader: ObjectReader<'_>,
    index: usize,
    bin: Option<&Bytes>,
) -> Result<Buffer> {
    let byte_length = reader.require_index("byteLength")?;
    let uri = reader.string("uri")?;

    let data = match (&uri, bin) {
        (None, Some(bin)) if index == 0 => Some(bin.clone()),
        (Some(uri), _) => match DataUri::parse(uri) {
            Some(data_uri) => {
                let bytes = data_uri.decode().map_err(|err| {
                    let pointer = reader.child_pointer("uri");
                    VrmError::schema(pointer, "base64 data URI", err.to_string())
                })?;
                Some(Bytes::from(bytes))
            }
            None => {
                log_debug!("buffer {index} references external uri '{uri}', left unresolved");
                None
            }
        },
        (None, _) => None,
    };

    Ok(Buffer {
        name: reader.string("name")?,
        byte_length,
        uri: uri.filter(|uri| DataUri::parse(uri).is_none()),
        data: data.map(|data| data.slice(..byte_length.min(data.len()))),
    })
}

// ─── Animation ────────────────────────────────────────────────────────────────

pub(super) fn decode_animation(reader: ObjectReader<'_>) -> Result<Animation> {
    let channels = reader
        .objects("channels")?
        .iter()
        .map(|child| -> Result<AnimationChannel> {
            let channel = child.reader();
            let target_child = channel.require_object("target")?;
            let target = target_child.reader();
            Ok(AnimationChannel {
                sampler: channel.require_index("sampler")?,
                target: AnimationTarget {
                    node: target.index("node")?,
                    path: target.require_string("path")?,
                },
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let samplers = reader
        .objects("samplers")?
        .iter()
        .map(|child| -> Result<AnimationSampler> {
            let sampler = child.reader();
            Ok(AnimationSampler {
                input: sampler.require_index("input")?,
                output: sampler.require_index("output")?,
                interpolation: sampler.string_or("interpolation", "LINEAR")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Animation {
        name: reader.string("name")?,
        channels,
        samplers,
        extras: reader.extras(),
    })
}
