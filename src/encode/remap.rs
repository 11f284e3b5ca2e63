//! Subset export: decide which entities survive, build every old→new index
//! table in one pass, then rewrite the document against those tables.

use crate::document::{Document, Material, TextureInfo};
use crate::error::{Result, VrmError};
use crate::log_info;
use crate::registry::ExtensionRegistry;
use crate::validate::NodeGraph;

/// Old→new index table for one collection. Dropped entries map to `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexMap {
    map: Vec<Option<usize>>,
}

impl IndexMap {
    pub fn identity(len: usize) -> Self {
        Self {
            map: (0..len).map(Some).collect(),
        }
    }

    /// Dense renumbering of the marked entries, in ascending old order.
    pub fn from_marks(marks: &[bool]) -> Self {
        let mut next = 0;
        let map = marks
            .iter()
            .map(|kept| {
                kept.then(|| {
                    next += 1;
                    next - 1
                })
            })
            .collect();
        Self { map }
    }

    pub fn get(&self, old: usize) -> Option<usize> {
        self.map.get(old).copied().flatten()
    }

    pub fn kept(&self) -> usize {
        self.map.iter().flatten().count()
    }

    /// Keep the entries that survive, preserving their relative order.
    pub fn retain<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .enumerate()
            .filter(|(old, _)| self.get(*old).is_some())
            .map(|(_, item)| item)
            .collect()
    }

    /// Rewrite a reference that must survive.
    pub fn require(&self, old: usize, pointer: &str) -> Result<usize> {
        self.get(old).ok_or_else(|| {
            VrmError::encoding(pointer, format!("reference to index {old} was dropped"))
        })
    }
}

/// Reachability marks for every remappable collection.
#[derive(Debug, Clone, Default)]
pub struct ReferenceMarks {
    pub nodes: Vec<bool>,
    pub meshes: Vec<bool>,
    pub skins: Vec<bool>,
    pub cameras: Vec<bool>,
    pub materials: Vec<bool>,
    pub textures: Vec<bool>,
    pub images: Vec<bool>,
    pub samplers: Vec<bool>,
    pub accessors: Vec<bool>,
    pub buffer_views: Vec<bool>,
    pub animations: Vec<bool>,
}

fn mark(slots: &mut [bool], index: usize) -> bool {
    match slots.get_mut(index) {
        Some(slot) if !*slot => {
            *slot = true;
            true
        }
        _ => false,
    }
}

impl ReferenceMarks {
    pub fn new(document: &Document) -> Self {
        Self {
            nodes: vec![false; document.nodes.len()],
            meshes: vec![false; document.meshes.len()],
            skins: vec![false; document.skins.len()],
            cameras: vec![false; document.cameras.len()],
            materials: vec![false; document.materials.len()],
            textures: vec![false; document.textures.len()],
            images: vec![false; document.images.len()],
            samplers: vec![false; document.samplers.len()],
            accessors: vec![false; document.accessors.len()],
            buffer_views: vec![false; document.buffer_views.len()],
            animations: vec![false; document.animations.len()],
        }
    }

    pub fn mark_node(&mut self, index: usize) -> bool {
        mark(&mut self.nodes, index)
    }

    pub fn mark_material(&mut self, index: usize) {
        mark(&mut self.materials, index);
    }

    pub fn mark_texture(&mut self, index: usize) {
        mark(&mut self.textures, index);
    }

    pub fn mark_image(&mut self, index: usize) {
        mark(&mut self.images, index);
    }

    pub fn mark_accessor(&mut self, index: usize) {
        mark(&mut self.accessors, index);
    }

    pub fn is_node_marked(&self, index: usize) -> bool {
        self.nodes.get(index).copied().unwrap_or(false)
    }

    /// Follow every core reference downwards from the marked nodes,
    /// materials, textures and images.
    fn close_over(&mut self, document: &Document) {
        for (index, node) in document.nodes.iter().enumerate() {
            if !self.nodes[index] {
                continue;
            }
            if let Some(mesh) = node.mesh {
                mark(&mut self.meshes, mesh);
            }
            if let Some(camera) = node.camera {
                mark(&mut self.cameras, camera);
            }
            if let Some(skin) = node.skin {
                mark(&mut self.skins, skin);
            }
        }

        for (index, mesh) in document.meshes.iter().enumerate() {
            if !self.meshes[index] {
                continue;
            }
            for primitive in &mesh.primitives {
                for accessor in primitive
                    .attributes
                    .values()
                    .chain(primitive.indices.iter())
                    .chain(primitive.targets.iter().flat_map(|target| target.values()))
                {
                    mark(&mut self.accessors, *accessor);
                }
                if let Some(material) = primitive.material {
                    mark(&mut self.materials, material);
                }
            }
        }

        for (index, skin) in document.skins.iter().enumerate() {
            if self.skins[index] {
                if let Some(accessor) = skin.inverse_bind_matrices {
                    mark(&mut self.accessors, accessor);
                }
            }
        }

        for (index, animation) in document.animations.iter().enumerate() {
            let targets_kept = animation.channels.iter().any(|channel| {
                channel
                    .target
                    .node
                    .is_some_and(|node| self.is_node_marked(node))
            });
            if !targets_kept {
                continue;
            }
            self.animations[index] = true;
            for sampler in &animation.samplers {
                mark(&mut self.accessors, sampler.input);
                mark(&mut self.accessors, sampler.output);
            }
        }

        for (index, material) in document.materials.iter().enumerate() {
            if self.materials[index] {
                for texture in material.texture_indices() {
                    mark(&mut self.textures, texture);
                }
            }
        }

        for (index, texture) in document.textures.iter().enumerate() {
            if !self.textures[index] {
                continue;
            }
            if let Some(source) = texture.source {
                mark(&mut self.images, source);
            }
            if let Some(sampler) = texture.sampler {
                mark(&mut self.samplers, sampler);
            }
        }

        for (index, image) in document.images.iter().enumerate() {
            if self.images[index] {
                if let Some(view) = image.buffer_view {
                    mark(&mut self.buffer_views, view);
                }
            }
        }

        for (index, accessor) in document.accessors.iter().enumerate() {
            if !self.accessors[index] {
                continue;
            }
            if let Some(view) = accessor.buffer_view {
                mark(&mut self.buffer_views, view);
            }
            if let Some(sparse) = &accessor.sparse {
                mark(&mut self.buffer_views, sparse.indices.buffer_view);
                mark(&mut self.buffer_views, sparse.values.buffer_view);
            }
        }
    }
}

/// Every old→new table a subset export needs.
#[derive(Debug, Clone, Default)]
pub struct RemapTables {
    pub nodes: IndexMap,
    pub meshes: IndexMap,
    pub skins: IndexMap,
    pub cameras: IndexMap,
    pub materials: IndexMap,
    pub textures: IndexMap,
    pub images: IndexMap,
    pub samplers: IndexMap,
    pub accessors: IndexMap,
    pub buffer_views: IndexMap,
    pub animations: IndexMap,
}

impl RemapTables {
    fn from_marks(marks: &ReferenceMarks) -> Self {
        Self {
            nodes: IndexMap::from_marks(&marks.nodes),
            meshes: IndexMap::from_marks(&marks.meshes),
            skins: IndexMap::from_marks(&marks.skins),
            cameras: IndexMap::from_marks(&marks.cameras),
            materials: IndexMap::from_marks(&marks.materials),
            textures: IndexMap::from_marks(&marks.textures),
            images: IndexMap::from_marks(&marks.images),
            samplers: IndexMap::from_marks(&marks.samplers),
            accessors: IndexMap::from_marks(&marks.accessors),
            buffer_views: IndexMap::from_marks(&marks.buffer_views),
            animations: IndexMap::from_marks(&marks.animations),
        }
    }
}

// ─── Selection ────────────────────────────────────────────────────────────────

/// Which part of the node graph an export covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NodeSelection {
    #[default]
    All,
    /// The listed nodes and all their descendants.
    Subtrees(Vec<usize>),
}

fn mark_selection(
    document: &Document,
    graph: &NodeGraph,
    roots: &[usize],
    marks: &mut ReferenceMarks,
) -> Result<()> {
    for &root in roots {
        if root >= document.nodes.len() {
            return Err(VrmError::encoding(
                format!("/nodes/{root}"),
                format!("selected node {root} does not exist"),
            ));
        }
        for node in graph.subtree(root) {
            marks.mark_node(node);
        }
    }

    // Skinned meshes drag their joints along, which can reach further skins.
    loop {
        let mut changed = false;
        for (index, node) in document.nodes.iter().enumerate() {
            if !marks.nodes[index] {
                continue;
            }
            let Some(skin) = node.skin.and_then(|skin| document.skins.get(skin)) else {
                continue;
            };
            for &joint in skin.joints.iter().chain(skin.skeleton.iter()) {
                changed |= marks.mark_node(joint);
            }
        }
        if !changed {
            return Ok(());
        }
    }
}

/// Build the subset document for `roots`, renumbered densely from zero.
pub(crate) fn select_subtrees(
    document: &Document,
    roots: &[usize],
    registry: &ExtensionRegistry,
) -> Result<Document> {
    let graph = NodeGraph::build(&document.nodes);
    let mut marks = ReferenceMarks::new(document);
    mark_selection(document, &graph, roots, &mut marks)?;

    marks.close_over(document);
    // Extensions see the core closure and may add roots of their own.
    if let Some(generation) = document.generation() {
        for schema in registry.for_generation(generation) {
            schema.mark_references(document, &mut marks);
        }
        marks.close_over(document);
    }

    let tables = RemapTables::from_marks(&marks);
    log_info!(
        "subset export keeps {}/{} nodes, {}/{} meshes, {}/{} materials",
        tables.nodes.kept(),
        document.nodes.len(),
        tables.meshes.kept(),
        document.meshes.len(),
        tables.materials.kept(),
        document.materials.len()
    );

    let mut subset = apply_tables(document, &graph, &tables)?;
    if let Some(generation) = document.generation() {
        for schema in registry.for_generation(generation) {
            schema.remap(&mut subset, &tables)?;
        }
    }
    Ok(subset)
}

// ─── Rewriting ────────────────────────────────────────────────────────────────

fn remap_texture_info(info: &mut TextureInfo, tables: &RemapTables, pointer: &str) -> Result<()> {
    info.index = tables.textures.require(info.index, pointer)?;
    Ok(())
}

fn remap_material(material: &mut Material, tables: &RemapTables, pointer: &str) -> Result<()> {
    let mut infos: Vec<&mut TextureInfo> = Vec::new();
    infos.extend(material.pbr.base_color_texture.as_mut());
    infos.extend(material.pbr.metallic_roughness_texture.as_mut());
    infos.extend(material.normal_texture.as_mut().map(|normal| &mut normal.info));
    infos.extend(
        material
            .occlusion_texture
            .as_mut()
            .map(|occlusion| &mut occlusion.info),
    );
    infos.extend(material.emissive_texture.as_mut());
    if let Some(mtoon) = material.mtoon.as_mut() {
        for slot in mtoon.textures_mut() {
            infos.extend(slot.as_mut());
        }
    }
    for info in infos {
        remap_texture_info(info, tables, pointer)?;
    }
    Ok(())
}

fn apply_tables(document: &Document, graph: &NodeGraph, tables: &RemapTables) -> Result<Document> {
    let mut subset = document.clone();

    let mut nodes = tables.nodes.retain(document.nodes.clone());
    for (new_index, node) in nodes.iter_mut().enumerate() {
        let pointer = format!("/nodes/{new_index}");
        node.children = node
            .children
            .iter()
            .filter_map(|child| tables.nodes.get(*child))
            .collect();
        node.mesh = node
            .mesh
            .map(|mesh| tables.meshes.require(mesh, &pointer))
            .transpose()?;
        node.skin = node
            .skin
            .map(|skin| tables.skins.require(skin, &pointer))
            .transpose()?;
        node.camera = node
            .camera
            .map(|camera| tables.cameras.require(camera, &pointer))
            .transpose()?;
    }
    subset.nodes = nodes;

    // Kept nodes whose parent was dropped become roots of the default scene.
    let orphans: Vec<usize> = (0..document.nodes.len())
        .filter(|node| tables.nodes.get(*node).is_some())
        .filter(|node| {
            graph
                .parent(*node)
                .is_none_or(|parent| tables.nodes.get(parent).is_none())
        })
        .collect();
    let default_scene = document.scene.unwrap_or(0);
    for (index, scene) in subset.scenes.iter_mut().enumerate() {
        let mut roots: Vec<usize> = scene
            .nodes
            .iter()
            .filter(|node| orphans.contains(node))
            .copied()
            .collect();
        if index == default_scene {
            for orphan in &orphans {
                if !roots.contains(orphan) {
                    roots.push(*orphan);
                }
            }
        }
        scene.nodes = roots
            .into_iter()
            .filter_map(|node| tables.nodes.get(node))
            .collect();
    }

    let mut meshes = tables.meshes.retain(document.meshes.clone());
    for (new_index, mesh) in meshes.iter_mut().enumerate() {
        let pointer = format!("/meshes/{new_index}");
        for primitive in &mut mesh.primitives {
            for accessor in primitive.attributes.values_mut() {
                *accessor = tables.accessors.require(*accessor, &pointer)?;
            }
            for target in &mut primitive.targets {
                for accessor in target.values_mut() {
                    *accessor = tables.accessors.require(*accessor, &pointer)?;
                }
            }
            primitive.indices = primitive
                .indices
                .map(|indices| tables.accessors.require(indices, &pointer))
                .transpose()?;
            primitive.material = primitive
                .material
                .map(|material| tables.materials.require(material, &pointer))
                .transpose()?;
        }
    }
    subset.meshes = meshes;

    let mut skins = tables.skins.retain(document.skins.clone());
    for (new_index, skin) in skins.iter_mut().enumerate() {
        let pointer = format!("/skins/{new_index}");
        skin.joints = skin
            .joints
            .iter()
            .map(|joint| tables.nodes.require(*joint, &pointer))
            .collect::<Result<_>>()?;
        skin.skeleton = skin
            .skeleton
            .map(|node| tables.nodes.require(node, &pointer))
            .transpose()?;
        skin.inverse_bind_matrices = skin
            .inverse_bind_matrices
            .map(|accessor| tables.accessors.require(accessor, &pointer))
            .transpose()?;
    }
    subset.skins = skins;

    subset.cameras = tables.cameras.retain(document.cameras.clone());

    let mut materials = tables.materials.retain(document.materials.clone());
    for (new_index, material) in materials.iter_mut().enumerate() {
        remap_material(material, tables, &format!("/materials/{new_index}"))?;
    }
    subset.materials = materials;

    let mut textures = tables.textures.retain(document.textures.clone());
    for (new_index, texture) in textures.iter_mut().enumerate() {
        let pointer = format!("/textures/{new_index}");
        texture.source = texture
            .source
            .map(|image| tables.images.require(image, &pointer))
            .transpose()?;
        texture.sampler = texture
            .sampler
            .map(|sampler| tables.samplers.require(sampler, &pointer))
            .transpose()?;
    }
    subset.textures = textures;

    let mut images = tables.images.retain(document.images.clone());
    for (new_index, image) in images.iter_mut().enumerate() {
        image.buffer_view = image
            .buffer_view
            .map(|view| tables.buffer_views.require(view, &format!("/images/{new_index}")))
            .transpose()?;
    }
    subset.images = images;
    subset.samplers = tables.samplers.retain(document.samplers.clone());

    let mut accessors = tables.accessors.retain(document.accessors.clone());
    for (new_index, accessor) in accessors.iter_mut().enumerate() {
        let pointer = format!("/accessors/{new_index}");
        accessor.buffer_view = accessor
            .buffer_view
            .map(|view| tables.buffer_views.require(view, &pointer))
            .transpose()?;
        if let Some(sparse) = accessor.sparse.as_mut() {
            sparse.indices.buffer_view = tables
                .buffer_views
                .require(sparse.indices.buffer_view, &pointer)?;
            sparse.values.buffer_view = tables
                .buffer_views
                .require(sparse.values.buffer_view, &pointer)?;
        }
    }
    subset.accessors = accessors;
    subset.buffer_views = tables.buffer_views.retain(document.buffer_views.clone());

    let mut animations = tables.animations.retain(document.animations.clone());
    for (new_index, animation) in animations.iter_mut().enumerate() {
        let pointer = format!("/animations/{new_index}");
        animation.channels.retain(|channel| {
            channel
                .target
                .node
                .is_none_or(|node| tables.nodes.get(node).is_some())
        });
        for channel in &mut animation.channels {
            channel.target.node = channel.target.node.and_then(|node| tables.nodes.get(node));
        }
        for sampler in &mut animation.samplers {
            sampler.input = tables.accessors.require(sampler.input, &pointer)?;
            sampler.output = tables.accessors.require(sampler.output, &pointer)?;
        }
    }
    subset.animations = animations;

    subset.scene = document.scene.filter(|scene| *scene < subset.scenes.len());
    Ok(subset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn given_marks_when_building_table_then_indices_are_dense_and_ordered() {
        let table = IndexMap::from_marks(&[true, false, true, true]);

        assert_eq!(table.get(0), Some(0));
        assert_eq!(table.get(1), None);
        assert_eq!(table.get(3), Some(2));
        assert_eq!(table.kept(), 3);
        assert_eq!(table.retain(vec!['a', 'b', 'c', 'd']), vec!['a', 'c', 'd']);
    }

    #[test]
    fn given_hair_subtree_when_selecting_then_only_hair_nodes_survive() {
        let document = fixtures::plain_document();
        let registry = ExtensionRegistry::new();

        let subset =
            select_subtrees(&document, &[fixtures::HAIR_ROOT], &registry).expect("subset");

        assert_eq!(subset.nodes.len(), 2);
        assert_eq!(subset.nodes[0].name.as_deref(), Some("hair_root"));
        assert_eq!(subset.nodes[0].children, vec![1]);
        assert!(subset.meshes.is_empty());
        assert!(subset.accessors.is_empty());
        assert_eq!(subset.scenes[0].nodes, vec![0]);
    }

    #[test]
    fn given_body_subtree_when_selecting_then_mesh_data_is_renumbered() {
        let document = fixtures::plain_document();
        let registry = ExtensionRegistry::new();

        let subset =
            select_subtrees(&document, &[fixtures::BODY_NODE], &registry).expect("subset");

        assert_eq!(subset.nodes.len(), 1);
        assert_eq!(subset.nodes[0].mesh, Some(0));
        assert_eq!(subset.meshes.len(), 1);
        assert_eq!(subset.accessors.len(), document.accessors.len());
        assert_eq!(subset.buffer_views.len(), document.buffer_views.len());
    }

    #[test]
    fn given_missing_root_when_selecting_then_encoding_violation_is_returned() {
        let document = fixtures::plain_document();
        let err = select_subtrees(&document, &[999], &ExtensionRegistry::new())
            .expect_err("node 999 does not exist");
        assert!(matches!(err, VrmError::EncodingConstraintViolation { .. }));
    }
}
