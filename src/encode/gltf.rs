//! Core glTF JSON writer. Fields at their glTF default are omitted.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use crate::document::{
    Accessor, AlphaMode, Animation, Asset, BufferView, Camera, CameraProjection, Document,
    ExtensionMap, Image, MODE_TRIANGLES, Material, Mesh, Node, Primitive, Sampler, Scene, Skin,
    Texture, Transform, WRAP_REPEAT,
};
use crate::error::Result;
use crate::registry::{
    ExtensionRegistry, SchemaScope, SchemaTarget, float_value, floats_value, texture_info_value,
};

// ─── Field helpers ────────────────────────────────────────────────────────────

fn put(object: &mut Map<String, Value>, key: &str, value: impl Into<Value>) {
    object.insert(key.to_string(), value.into());
}

fn put_opt<T: Into<Value>>(object: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(value) = value {
        put(object, key, value);
    }
}

fn put_indices(object: &mut Map<String, Value>, key: &str, indices: &[usize]) {
    if !indices.is_empty() {
        put(object, key, indices.to_vec());
    }
}

fn put_floats(object: &mut Map<String, Value>, key: &str, values: &[f32], default: &[f32]) {
    if values != default {
        object.insert(key.to_string(), floats_value(values));
    }
}

fn put_float(object: &mut Map<String, Value>, key: &str, value: f32, default: f32) {
    if value != default {
        object.insert(key.to_string(), float_value(value));
    }
}

fn put_extras(object: &mut Map<String, Value>, extras: &Option<Value>) {
    if let Some(extras) = extras {
        object.insert("extras".to_string(), extras.clone());
    }
}

/// Write `extensions` from the pass-through map plus schema output.
fn put_extensions(
    object: &mut Map<String, Value>,
    passthrough: &ExtensionMap,
    owned: Map<String, Value>,
) {
    let mut extensions: Map<String, Value> = passthrough
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    extensions.extend(owned);
    if !extensions.is_empty() {
        object.insert("extensions".to_string(), Value::Object(extensions));
    }
}

/// Names of extension objects actually written, collected while encoding.
#[derive(Debug, Default)]
pub(super) struct EmittedExtensions {
    pub names: BTreeSet<String>,
}

impl EmittedExtensions {
    fn record(&mut self, passthrough: &ExtensionMap, owned: &Map<String, Value>) {
        self.names.extend(passthrough.keys().cloned());
        self.names.extend(owned.keys().cloned());
    }
}

fn schema_extensions(
    document: &Document,
    registry: &ExtensionRegistry,
    scope: SchemaScope,
    target: SchemaTarget,
) -> Result<Map<String, Value>> {
    let mut owned = Map::new();
    let Some(generation) = document.generation() else {
        return Ok(owned);
    };
    for schema in registry.for_scope(generation, scope) {
        if let Some(value) = schema.encode(document, target)? {
            owned.insert(schema.name().to_string(), value);
        }
    }
    Ok(owned)
}

// ─── Entities ─────────────────────────────────────────────────────────────────

fn write_asset(asset: &Asset) -> Value {
    let mut object = Map::new();
    put(&mut object, "version", asset.version.clone());
    put_opt(&mut object, "generator", asset.generator.clone());
    put_opt(&mut object, "copyright", asset.copyright.clone());
    put_opt(&mut object, "minVersion", asset.min_version.clone());
    Value::Object(object)
}

fn write_scene(scene: &Scene) -> Value {
    let mut object = Map::new();
    put_opt(&mut object, "name", scene.name.clone());
    put_indices(&mut object, "nodes", &scene.nodes);
    put_extras(&mut object, &scene.extras);
    Value::Object(object)
}

fn write_node(node: &Node, owned: Map<String, Value>) -> Value {
    let mut object = Map::new();
    put_opt(&mut object, "name", node.name.clone());
    put_indices(&mut object, "children", &node.children);
    put_opt(&mut object, "mesh", node.mesh);
    put_opt(&mut object, "skin", node.skin);
    put_opt(&mut object, "camera", node.camera);
    match &node.transform {
        Transform::Matrix(matrix) => {
            object.insert("matrix".to_string(), floats_value(matrix));
        }
        Transform::Trs {
            translation,
            rotation,
            scale,
        } => {
            put_floats(&mut object, "translation", translation, &[0.0; 3]);
            put_floats(&mut object, "rotation", rotation, &[0.0, 0.0, 0.0, 1.0]);
            put_floats(&mut object, "scale", scale, &[1.0; 3]);
        }
    }
    if !node.weights.is_empty() {
        object.insert("weights".to_string(), floats_value(&node.weights));
    }
    put_extensions(&mut object, &node.extensions, owned);
    put_extras(&mut object, &node.extras);
    Value::Object(object)
}

fn write_skin(skin: &Skin) -> Value {
    let mut object = Map::new();
    put_opt(&mut object, "name", skin.name.clone());
    put_opt(&mut object, "inverseBindMatrices", skin.inverse_bind_matrices);
    put_opt(&mut object, "skeleton", skin.skeleton);
    put(&mut object, "joints", skin.joints.clone());
    put_extras(&mut object, &skin.extras);
    Value::Object(object)
}

fn write_camera(camera: &Camera) -> Value {
    let mut object = Map::new();
    put_opt(&mut object, "name", camera.name.clone());
    match &camera.projection {
        CameraProjection::Perspective {
            yfov,
            znear,
            zfar,
            aspect_ratio,
        } => {
            let mut perspective = Map::new();
            perspective.insert("yfov".to_string(), float_value(*yfov));
            perspective.insert("znear".to_string(), float_value(*znear));
            if let Some(zfar) = zfar {
                perspective.insert("zfar".to_string(), float_value(*zfar));
            }
            if let Some(aspect_ratio) = aspect_ratio {
                perspective.insert("aspectRatio".to_string(), float_value(*aspect_ratio));
            }
            put(&mut object, "type", "perspective");
            put(&mut object, "perspective", Value::Object(perspective));
        }
        CameraProjection::Orthographic {
            xmag,
            ymag,
            znear,
            zfar,
        } => {
            let mut orthographic = Map::new();
            orthographic.insert("xmag".to_string(), float_value(*xmag));
            orthographic.insert("ymag".to_string(), float_value(*ymag));
            orthographic.insert("znear".to_string(), float_value(*znear));
            orthographic.insert("zfar".to_string(), float_value(*zfar));
            put(&mut object, "type", "orthographic");
            put(&mut object, "orthographic", Value::Object(orthographic));
        }
    }
    Value::Object(object)
}

fn index_map_value(map: &BTreeMap<String, usize>) -> Value {
    Value::Object(
        map.iter()
            .map(|(key, index)| (key.clone(), Value::from(*index)))
            .collect(),
    )
}

fn write_primitive(primitive: &Primitive, emitted: &mut EmittedExtensions) -> Value {
    let mut object = Map::new();
    put(&mut object, "attributes", index_map_value(&primitive.attributes));
    put_opt(&mut object, "indices", primitive.indices);
    put_opt(&mut object, "material", primitive.material);
    if primitive.mode != MODE_TRIANGLES {
        put(&mut object, "mode", primitive.mode);
    }
    if !primitive.targets.is_empty() {
        put(
            &mut object,
            "targets",
            Value::Array(primitive.targets.iter().map(index_map_value).collect()),
        );
    }
    emitted.record(&primitive.extensions, &Map::new());
    put_extensions(&mut object, &primitive.extensions, Map::new());
    put_extras(&mut object, &primitive.extras);
    Value::Object(object)
}

fn write_mesh(mesh: &Mesh, emitted: &mut EmittedExtensions) -> Value {
    let mut object = Map::new();
    put_opt(&mut object, "name", mesh.name.clone());
    put(
        &mut object,
        "primitives",
        Value::Array(
            mesh.primitives
                .iter()
                .map(|primitive| write_primitive(primitive, emitted))
                .collect(),
        ),
    );
    if !mesh.weights.is_empty() {
        object.insert("weights".to_string(), floats_value(&mesh.weights));
    }
    emitted.record(&mesh.extensions, &Map::new());
    put_extensions(&mut object, &mesh.extensions, Map::new());
    put_extras(&mut object, &mesh.extras);
    Value::Object(object)
}

fn write_material(material: &Material, owned: Map<String, Value>) -> Value {
    let mut object = Map::new();
    put_opt(&mut object, "name", material.name.clone());

    let pbr = &material.pbr;
    let mut pbr_object = Map::new();
    put_floats(&mut pbr_object, "baseColorFactor", &pbr.base_color_factor, &[1.0; 4]);
    if let Some(info) = &pbr.base_color_texture {
        put(&mut pbr_object, "baseColorTexture", texture_info_value(info));
    }
    put_float(&mut pbr_object, "metallicFactor", pbr.metallic_factor, 1.0);
    put_float(&mut pbr_object, "roughnessFactor", pbr.roughness_factor, 1.0);
    if let Some(info) = &pbr.metallic_roughness_texture {
        put(&mut pbr_object, "metallicRoughnessTexture", texture_info_value(info));
    }
    if !pbr_object.is_empty() {
        put(&mut object, "pbrMetallicRoughness", Value::Object(pbr_object));
    }

    if let Some(normal) = &material.normal_texture {
        let mut info = texture_info_value(&normal.info);
        if let Some(info) = info.as_object_mut() {
            put_float(info, "scale", normal.scale, 1.0);
        }
        put(&mut object, "normalTexture", info);
    }
    if let Some(occlusion) = &material.occlusion_texture {
        let mut info = texture_info_value(&occlusion.info);
        if let Some(info) = info.as_object_mut() {
            put_float(info, "strength", occlusion.strength, 1.0);
        }
        put(&mut object, "occlusionTexture", info);
    }
    if let Some(info) = &material.emissive_texture {
        put(&mut object, "emissiveTexture", texture_info_value(info));
    }
    put_floats(&mut object, "emissiveFactor", &material.emissive_factor, &[0.0; 3]);
    if material.alpha_mode != AlphaMode::Opaque {
        put(&mut object, "alphaMode", material.alpha_mode.as_str());
    }
    put_float(&mut object, "alphaCutoff", material.alpha_cutoff, 0.5);
    if material.double_sided {
        put(&mut object, "doubleSided", true);
    }
    put_extensions(&mut object, &material.extensions, owned);
    put_extras(&mut object, &material.extras);
    Value::Object(object)
}

fn write_texture(texture: &Texture) -> Value {
    let mut object = Map::new();
    put_opt(&mut object, "name", texture.name.clone());
    put_opt(&mut object, "sampler", texture.sampler);
    put_opt(&mut object, "source", texture.source);
    put_extensions(&mut object, &texture.extensions, Map::new());
    put_extras(&mut object, &texture.extras);
    Value::Object(object)
}

fn write_image(image: &Image) -> Value {
    let mut object = Map::new();
    put_opt(&mut object, "name", image.name.clone());
    put_opt(&mut object, "uri", image.uri.clone());
    put_opt(&mut object, "mimeType", image.mime_type.clone());
    put_opt(&mut object, "bufferView", image.buffer_view);
    Value::Object(object)
}

fn write_sampler(sampler: &Sampler) -> Value {
    let mut object = Map::new();
    put_opt(&mut object, "name", sampler.name.clone());
    put_opt(&mut object, "magFilter", sampler.mag_filter);
    put_opt(&mut object, "minFilter", sampler.min_filter);
    if sampler.wrap_s != WRAP_REPEAT {
        put(&mut object, "wrapS", sampler.wrap_s);
    }
    if sampler.wrap_t != WRAP_REPEAT {
        put(&mut object, "wrapT", sampler.wrap_t);
    }
    Value::Object(object)
}

fn f64s_value(values: &[f64]) -> Value {
    Value::Array(
        values
            .iter()
            .map(|value| {
                serde_json::Number::from_f64(*value)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            })
            .collect(),
    )
}

fn write_accessor(accessor: &Accessor) -> Value {
    let mut object = Map::new();
    put_opt(&mut object, "name", accessor.name.clone());
    put_opt(&mut object, "bufferView", accessor.buffer_view);
    if accessor.byte_offset != 0 {
        put(&mut object, "byteOffset", accessor.byte_offset);
    }
    put(&mut object, "componentType", accessor.component_type.code());
    if accessor.normalized {
        put(&mut object, "normalized", true);
    }
    put(&mut object, "count", accessor.count);
    put(&mut object, "type", accessor.element_type.as_str());
    if !accessor.min.is_empty() {
        put(&mut object, "min", f64s_value(&accessor.min));
    }
    if !accessor.max.is_empty() {
        put(&mut object, "max", f64s_value(&accessor.max));
    }
    if let Some(sparse) = &accessor.sparse {
        let mut indices = Map::new();
        put(&mut indices, "bufferView", sparse.indices.buffer_view);
        if sparse.indices.byte_offset != 0 {
            put(&mut indices, "byteOffset", sparse.indices.byte_offset);
        }
        put(&mut indices, "componentType", sparse.indices.component_type.code());
        let mut values = Map::new();
        put(&mut values, "bufferView", sparse.values.buffer_view);
        if sparse.values.byte_offset != 0 {
            put(&mut values, "byteOffset", sparse.values.byte_offset);
        }
        let mut sparse_object = Map::new();
        put(&mut sparse_object, "count", sparse.count);
        put(&mut sparse_object, "indices", Value::Object(indices));
        put(&mut sparse_object, "values", Value::Object(values));
        put(&mut object, "sparse", Value::Object(sparse_object));
    }
    put_extensions(&mut object, &accessor.extensions, Map::new());
    put_extras(&mut object, &accessor.extras);
    Value::Object(object)
}

fn write_buffer_view(view: &BufferView) -> Value {
    let mut object = Map::new();
    put_opt(&mut object, "name", view.name.clone());
    put(&mut object, "buffer", view.buffer);
    if view.byte_offset != 0 {
        put(&mut object, "byteOffset", view.byte_offset);
    }
    put(&mut object, "byteLength", view.byte_length);
    put_opt(&mut object, "byteStride", view.byte_stride);
    put_opt(&mut object, "target", view.target);
    Value::Object(object)
}

fn write_animation(animation: &Animation) -> Value {
    let channels = animation
        .channels
        .iter()
        .map(|channel| {
            let mut target = Map::new();
            put_opt(&mut target, "node", channel.target.node);
            put(&mut target, "path", channel.target.path.clone());
            let mut object = Map::new();
            put(&mut object, "sampler", channel.sampler);
            put(&mut object, "target", Value::Object(target));
            Value::Object(object)
        })
        .collect();
    let samplers = animation
        .samplers
        .iter()
        .map(|sampler| {
            let mut object = Map::new();
            put(&mut object, "input", sampler.input);
            put(&mut object, "output", sampler.output);
            if sampler.interpolation != "LINEAR" {
                put(&mut object, "interpolation", sampler.interpolation.clone());
            }
            Value::Object(object)
        })
        .collect();

    let mut object = Map::new();
    put_opt(&mut object, "name", animation.name.clone());
    put(&mut object, "channels", Value::Array(channels));
    put(&mut object, "samplers", Value::Array(samplers));
    put_extras(&mut object, &animation.extras);
    Value::Object(object)
}

// ─── Document ─────────────────────────────────────────────────────────────────

fn put_array<T>(
    root: &mut Map<String, Value>,
    key: &str,
    items: &[T],
    write: impl FnMut(&T) -> Value,
) {
    if !items.is_empty() {
        put(root, key, Value::Array(items.iter().map(write).collect()));
    }
}

/// Write the document's JSON. Buffers must already be packed so that the
/// first buffer is the GLB BIN chunk.
pub(super) fn write_document(
    document: &Document,
    registry: &ExtensionRegistry,
) -> Result<Value> {
    let mut emitted = EmittedExtensions::default();
    let mut root = Map::new();
    put(&mut root, "asset", write_asset(&document.asset));
    put_opt(&mut root, "scene", document.scene);
    put_array(&mut root, "scenes", &document.scenes, write_scene);

    let mut nodes = Vec::with_capacity(document.nodes.len());
    for (index, node) in document.nodes.iter().enumerate() {
        let owned =
            schema_extensions(document, registry, SchemaScope::Node, SchemaTarget::Node(index))?;
        emitted.record(&node.extensions, &owned);
        nodes.push(write_node(node, owned));
    }
    if !nodes.is_empty() {
        put(&mut root, "nodes", Value::Array(nodes));
    }

    put_array(&mut root, "meshes", &document.meshes, |mesh| write_mesh(mesh, &mut emitted));

    let mut materials = Vec::with_capacity(document.materials.len());
    for (index, material) in document.materials.iter().enumerate() {
        let owned = schema_extensions(
            document,
            registry,
            SchemaScope::Material,
            SchemaTarget::Material(index),
        )?;
        emitted.record(&material.extensions, &owned);
        materials.push(write_material(material, owned));
    }
    if !materials.is_empty() {
        put(&mut root, "materials", Value::Array(materials));
    }

    for texture in &document.textures {
        emitted.record(&texture.extensions, &Map::new());
    }
    put_array(&mut root, "textures", &document.textures, write_texture);
    put_array(&mut root, "images", &document.images, write_image);
    put_array(&mut root, "samplers", &document.samplers, write_sampler);
    put_array(&mut root, "accessors", &document.accessors, write_accessor);
    put_array(&mut root, "bufferViews", &document.buffer_views, write_buffer_view);
    put_array(&mut root, "buffers", &document.buffers, |buffer| {
        let mut object = Map::new();
        put_opt(&mut object, "name", buffer.name.clone());
        put(&mut object, "byteLength", buffer.byte_length);
        Value::Object(object)
    });
    put_array(&mut root, "animations", &document.animations, write_animation);
    put_array(&mut root, "skins", &document.skins, write_skin);
    put_array(&mut root, "cameras", &document.cameras, write_camera);

    let owned = schema_extensions(document, registry, SchemaScope::Root, SchemaTarget::Root)?;
    emitted.record(&document.extensions, &owned);
    put_extensions(&mut root, &document.extensions, owned);
    put_extras(&mut root, &document.extras);

    let all_owned: Vec<&str> = [SchemaScope::Root, SchemaScope::Node, SchemaScope::Material]
        .into_iter()
        .flat_map(|scope| registry.all_names(scope))
        .collect();
    let used = extensions_used(&document.extensions_used, &all_owned, &emitted);
    if !used.is_empty() {
        put(&mut root, "extensionsUsed", used);
    }
    let required: Vec<String> = document
        .extensions_required
        .iter()
        .filter(|name| !all_owned.contains(&name.as_str()) || emitted.names.contains(*name))
        .cloned()
        .collect();
    if !required.is_empty() {
        put(&mut root, "extensionsRequired", required);
    }

    Ok(Value::Object(root))
}

/// Keep the original order, drop schema-owned names that were not written,
/// and append names that were written but not yet listed.
fn extensions_used(
    original: &[String],
    owned: &[&str],
    emitted: &EmittedExtensions,
) -> Vec<String> {
    let mut used: Vec<String> = original
        .iter()
        .filter(|name| !owned.contains(&name.as_str()) || emitted.names.contains(*name))
        .cloned()
        .collect();
    for name in &emitted.names {
        if !used.contains(name) {
            used.push(name.clone());
        }
    }
    used
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_owned_extension_not_emitted_when_listing_used_then_it_is_dropped() {
        let mut emitted = EmittedExtensions::default();
        emitted.names.insert("VRMC_vrm".to_string());
        emitted.names.insert("KHR_materials_unlit".to_string());

        let used = extensions_used(
            &["VRM".to_string(), "KHR_materials_unlit".to_string()],
            &["VRM", "VRMC_vrm"],
            &emitted,
        );
        assert_eq!(used, vec!["KHR_materials_unlit", "VRMC_vrm"]);
    }

    #[test]
    fn given_default_node_when_writing_then_only_non_default_fields_appear() {
        let value = write_node(&Node::default(), Map::new());
        assert_eq!(value, serde_json::json!({}));
    }
}
