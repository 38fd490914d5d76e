//! The shading visitor: per-subtree requirement accumulation and shader
//! permutation selection.
//!
//! [`ShaderVisitor`] walks a scene graph depth-first. Nodes carrying their
//! own render state push a value-copy of the current requirement frame,
//! merge their local texture/material state into it, and pop on the way
//! back up; nodes without state inherit the enclosing frame with zero
//! copies. At drawable leaves the accumulated frame — the union of every
//! enclosing ancestor's overrides plus the leaf's own — drives geometry
//! adjustment (UV backfill, tangent generation) and shader program
//! synthesis.
//!
//! The fixed-function path stays a valid terminal state: unless a feature
//! forces a shader (or [`ShadingConfig::force_shaders`] is set), a subtree
//! is left untouched and renders exactly as authored. Failures degrade the
//! same way — a missing companion map or a shader that does not resolve is
//! logged and the node keeps its previous state.
//!
//! # Companion-map discovery
//!
//! With auto-detection enabled, a diffuse map named `rock.dds` probes the
//! virtual filesystem for `rock_nh.dds` (normal+height), `rock_n.dds`
//! (normal), `rock_spec.dds` and `rock_roughness.dds`. A hit synthesizes a
//! texture binding at the next free unit, mirroring the diffuse map's
//! sampler settings, and upgrades the requirement frame as if the map had
//! been authored in.

use std::rc::Rc;

use crate::lights::{LightCache, install_point_light_uniforms};
use crate::requirements::{RequirementsStack, ShaderRequirements};
use crate::scene::{
    Drawable, NodeId, NodeKind, Scene, StateSet, Texture, TextureSource, UniformValue,
};
use crate::shader::{
    NORMAL_HEIGHT_ROLE, ShaderCache, ShaderStage, is_texture_role, permutation_defines,
};
use crate::vfs::{Image, ImageCache, Vfs, companion_path};

/// Configuration for one shading pass.
#[derive(Clone, Debug)]
pub struct ShadingConfig {
    /// Synthesize shaders even for subtrees that do not require them.
    pub force_shaders: bool,
    /// When false, shared render state is never mutated: every write goes
    /// through a fresh copy of the node's state set (required when the same
    /// geometry is shared across visual variants).
    pub allow_state_modification: bool,
    /// Probe for companion normal maps next to diffuse maps.
    pub auto_normal_maps: bool,
    /// Probe for companion specular maps next to diffuse maps.
    pub auto_specular_maps: bool,
    /// Probe for companion roughness maps next to diffuse maps.
    pub auto_roughness_maps: bool,
    /// Filename pattern for plain normal maps.
    pub normal_map_pattern: String,
    /// Filename pattern for combined normal+height maps; probed first and
    /// winning enables the parallax path.
    pub normal_height_map_pattern: String,
    /// Filename pattern for specular maps.
    pub specular_map_pattern: String,
    /// Filename pattern for roughness maps.
    pub roughness_map_pattern: String,
    /// Vertex shader template requested from the shader cache.
    pub vertex_template: String,
    /// Fragment shader template requested from the shader cache.
    pub fragment_template: String,
    /// Constant uniforms installed on every visited state set.
    pub extra_uniforms: Vec<(String, UniformValue)>,
}

impl Default for ShadingConfig {
    fn default() -> Self {
        Self {
            force_shaders: false,
            allow_state_modification: true,
            auto_normal_maps: false,
            auto_specular_maps: false,
            auto_roughness_maps: false,
            normal_map_pattern: "_n".to_string(),
            normal_height_map_pattern: "_nh".to_string(),
            specular_map_pattern: "_spec".to_string(),
            roughness_map_pattern: "_roughness".to_string(),
            vertex_template: "objects_vertex.glsl".to_string(),
            fragment_template: "objects_fragment.glsl".to_string(),
            extra_uniforms: Vec::new(),
        }
    }
}

/// Depth-first visitor accumulating shading requirements and attaching
/// shader programs.
///
/// Holds non-owning `Rc` references to its collaborators; the caches are
/// the canonical owners of shaders, images and light lists and must outlive
/// the visitor (and any uniform hooks it installs).
pub struct ShaderVisitor {
    config: ShadingConfig,
    shader_cache: Rc<dyn ShaderCache>,
    vfs: Rc<dyn Vfs>,
    image_cache: Rc<dyn ImageCache>,
    light_cache: Rc<dyn LightCache>,
    requirements: RequirementsStack,
}

impl ShaderVisitor {
    /// Creates a visitor over the given collaborators.
    pub fn new(
        config: ShadingConfig,
        shader_cache: Rc<dyn ShaderCache>,
        vfs: Rc<dyn Vfs>,
        image_cache: Rc<dyn ImageCache>,
        light_cache: Rc<dyn LightCache>,
    ) -> Self {
        Self {
            config,
            shader_cache,
            vfs,
            image_cache,
            light_cache,
            requirements: RequirementsStack::new(),
        }
    }

    /// Runs the shading pass over the subtree rooted at `root`.
    pub fn visit(&mut self, scene: &mut Scene, root: NodeId) {
        self.apply_node(scene, root);
        debug_assert_eq!(self.requirements.depth(), 1);
    }

    /// Current requirement stack depth (1 = only the root frame).
    pub fn requirements_depth(&self) -> usize {
        self.requirements.depth()
    }

    /// Pushes an inherited requirement frame for `id`, runs `f`, pops.
    ///
    /// The pop happens on every exit path out of `f`, so traversal code can
    /// return early without unbalancing the stack.
    fn with_pushed(
        &mut self,
        scene: &mut Scene,
        id: NodeId,
        f: impl FnOnce(&mut Self, &mut Scene),
    ) {
        self.requirements.push_inherited(id);
        f(self, scene);
        self.requirements.pop();
    }

    fn apply_node(&mut self, scene: &mut Scene, id: NodeId) {
        if matches!(scene.node(id).kind, NodeKind::Drawable(_)) {
            self.apply_drawable(scene, id);
            return;
        }
        match scene.state(id) {
            Some(reader) => self.with_pushed(scene, id, |visitor, scene| {
                visitor.apply_state_set(scene, &reader, id);
                visitor.traverse_children(scene, id);
            }),
            None => self.traverse_children(scene, id),
        }
    }

    fn traverse_children(&mut self, scene: &mut Scene, id: NodeId) {
        let children = scene.node(id).children.clone();
        for child in children {
            self.apply_node(scene, child);
        }
    }

    fn apply_drawable(&mut self, scene: &mut Scene, id: NodeId) {
        match scene.state(id) {
            Some(reader) => self.with_pushed(scene, id, |visitor, scene| {
                visitor.apply_state_set(scene, &reader, id);
                visitor.finish_drawable(scene, id);
            }),
            None => self.finish_drawable(scene, id),
        }
    }

    /// Geometry adjustment and program synthesis at a drawable leaf, using
    /// the current top-of-stack frame.
    fn finish_drawable(&mut self, scene: &mut Scene, id: NodeId) {
        let plain_mesh = matches!(
            scene.node(id).kind,
            NodeKind::Drawable(Drawable::Mesh(_))
        );
        if plain_mesh {
            self.adjust_drawable_geometry(scene, id);
            self.create_program(scene, id);
        } else {
            // Rigged/morphing drawables synthesize first, then adjust their
            // replaceable source geometry.
            self.create_program(scene, id);
            self.adjust_drawable_geometry(scene, id);
        }
    }

    /// Writable state access honoring `allow_state_modification`.
    ///
    /// `copied` tracks whether this visit already paid for its private
    /// copy, so repeated writes within one visit mutate the same copy.
    fn writable<'s>(&self, scene: &'s mut Scene, id: NodeId, copied: &mut bool) -> &'s mut StateSet {
        if self.config.allow_state_modification || *copied {
            scene.writable_state(id)
        } else {
            *copied = true;
            scene.cloned_writable_state(id)
        }
    }

    /// Merges one state set into the top requirement frame and installs the
    /// unconditional uniforms.
    fn apply_state_set(&mut self, scene: &mut Scene, reader: &StateSet, id: NodeId) {
        let mut copied = false;
        let mut diffuse: Option<Rc<Texture>> = None;
        let mut has_normal = false;
        let mut has_specular = false;
        let mut has_roughness = false;

        for (&unit, attachment) in &reader.textures {
            let mut role = attachment.texture.name.clone();
            if (role.is_empty() || !is_texture_role(&role)) && unit == 0 {
                role = "diffuseMap".to_string();
            }
            if role == NORMAL_HEIGHT_ROLE {
                self.requirements.top_mut().normal_height = true;
                role = "normalMap".to_string();
            }
            if !is_texture_role(&role) {
                log::warn!(
                    "unrecognized texture name {:?} at unit {unit}; no role assigned",
                    attachment.texture.name
                );
                continue;
            }

            self.requirements.top_mut().textures.insert(unit, role.clone());
            match role.as_str() {
                "normalMap" => {
                    let reqs = self.requirements.top_mut();
                    reqs.tex_stage_requiring_tangents = Some(unit);
                    reqs.shader_required = true;
                    has_normal = true;
                    // Normal maps ship with the fixed-function mode off so
                    // the non-shader path never samples them; the shader
                    // path needs the unit enabled.
                    let state = self.writable(scene, id, &mut copied);
                    if let Some(bound) = state.textures.get_mut(&unit) {
                        bound.enabled = true;
                    }
                }
                "diffuseMap" => diffuse = Some(attachment.texture.clone()),
                "specularMap" => has_specular = true,
                "roughnessMap" => has_roughness = true,
                _ => {}
            }
        }

        if self.config.auto_normal_maps && !has_normal {
            if let Some(diffuse) = diffuse.clone() {
                let mut normal_height = true;
                let mut found =
                    self.probe_companion(&diffuse, &self.config.normal_height_map_pattern);
                if found.is_none() {
                    normal_height = false;
                    found = self.probe_companion(&diffuse, &self.config.normal_map_pattern);
                }
                if let Some((path, image)) = found {
                    let unit = self.next_free_unit(scene, id);
                    let texture = Rc::new(synthesized_texture("normalMap", path, image, &diffuse));
                    self.writable(scene, id, &mut copied).bind_texture(unit, texture);
                    let reqs = self.requirements.top_mut();
                    reqs.textures.insert(unit, "normalMap".to_string());
                    reqs.tex_stage_requiring_tangents = Some(unit);
                    reqs.shader_required = true;
                    reqs.normal_height = normal_height;
                }
            }
        }
        if self.config.auto_specular_maps && !has_specular {
            if let Some(diffuse) = diffuse.clone() {
                if let Some((path, image)) =
                    self.probe_companion(&diffuse, &self.config.specular_map_pattern)
                {
                    let unit = self.next_free_unit(scene, id);
                    let texture =
                        Rc::new(synthesized_texture("specularMap", path, image, &diffuse));
                    self.writable(scene, id, &mut copied).bind_texture(unit, texture);
                    let reqs = self.requirements.top_mut();
                    reqs.textures.insert(unit, "specularMap".to_string());
                    reqs.shader_required = true;
                }
            }
        }
        if self.config.auto_roughness_maps && !has_roughness {
            if let Some(diffuse) = diffuse.clone() {
                if let Some((path, image)) =
                    self.probe_companion(&diffuse, &self.config.roughness_map_pattern)
                {
                    let unit = self.next_free_unit(scene, id);
                    let texture =
                        Rc::new(synthesized_texture("roughnessMap", path, image, &diffuse));
                    self.writable(scene, id, &mut copied).bind_texture(unit, texture);
                    let reqs = self.requirements.top_mut();
                    reqs.textures.insert(unit, "roughnessMap".to_string());
                    reqs.shader_required = true;
                }
            }
        }

        if diffuse.is_some() {
            self.writable(scene, id, &mut copied)
                .set_uniform("useDiffuseMapForShadowAlpha", UniformValue::Bool(true));
        }

        if let Some(binding) = reader.material {
            let reqs = self.requirements.top_mut();
            if !reqs.material_overridden || binding.protected {
                if binding.overrides_children {
                    reqs.material_overridden = true;
                }
                reqs.color_mode = binding.material.color_mode;
            }
        }

        // Every visited state gets the per-light wiring and the caller's
        // constant uniforms, shader or not.
        let light_cache = self.light_cache.clone();
        let extra = self.config.extra_uniforms.clone();
        let state = self.writable(scene, id, &mut copied);
        install_point_light_uniforms(state, &light_cache);
        for (name, value) in extra {
            state.set_uniform(name, value);
        }
    }

    /// Next texture unit past every binding on the node and in the frame.
    ///
    /// The frame's role map alone is not enough here: a unit holding an
    /// unrecognized-name texture carries no role but still occupies its
    /// slot on the state set, and a synthesized map must not displace it.
    fn next_free_unit(&self, scene: &Scene, id: NodeId) -> u32 {
        let frame_max = self.requirements.top().textures.keys().max().copied();
        let state_max = scene
            .state(id)
            .and_then(|state| state.textures.keys().max().copied());
        frame_max.max(state_max).map_or(0, |max| max + 1)
    }

    /// Probes the VFS for a companion of `diffuse` built from `pattern`.
    fn probe_companion(&self, diffuse: &Texture, pattern: &str) -> Option<(String, Rc<Image>)> {
        let candidate = companion_path(diffuse.path()?, pattern)?;
        if !self.vfs.exists(&candidate) {
            return None;
        }
        let image = self.image_cache.image(&candidate)?;
        Some((candidate, image))
    }

    /// Backfills UV sets and generates tangents for the drawable at `id`,
    /// per the current frame.
    fn adjust_drawable_geometry(&mut self, scene: &mut Scene, id: NodeId) {
        let reqs = self.requirements.top();
        let use_shader = reqs.shader_required || self.config.force_shaders;
        let wants_tangents = reqs.tex_stage_requiring_tangents.is_some();
        if !self.config.allow_state_modification || !(use_shader || wants_tangents) {
            return;
        }
        let units: Vec<u32> = reqs.textures.keys().copied().collect();
        let tangent_unit = reqs.tex_stage_requiring_tangents;

        let NodeKind::Drawable(drawable) = &mut scene.node_mut(id).kind else {
            return;
        };
        let geometry = if matches!(drawable, Drawable::Mesh(_)) {
            drawable.geometry_mut()
        } else {
            drawable.replaceable_source_geometry_mut()
        };
        let Some(geometry) = geometry else {
            return;
        };
        for unit in units {
            geometry.backfill_uv_set(unit);
        }
        if let Some(unit) = tangent_unit {
            geometry.generate_tangents(unit);
        }
    }

    /// Synthesizes and attaches a shader program for the current frame.
    ///
    /// The program attaches to the frame's recorded node — the nearest
    /// ancestor that pushed state — falling back to the drawable itself
    /// when the root frame never recorded one. On compile failure the node
    /// silently keeps its previous state; no retry within this traversal.
    fn create_program(&mut self, scene: &mut Scene, fallback: NodeId) {
        let reqs = self.requirements.top();
        if !reqs.shader_required && !self.config.force_shaders {
            return;
        }
        let target = reqs.node.unwrap_or(fallback);
        let defines = permutation_defines(&reqs.textures, reqs.normal_height);
        let color_mode = reqs.color_mode;
        let textures = reqs.textures.clone();

        let mut copied = false;
        self.writable(scene, target, &mut copied)
            .set_uniform("colorMode", UniformValue::Int(color_mode as i32));

        let vertex =
            self.shader_cache
                .shader(&self.config.vertex_template, &defines, ShaderStage::Vertex);
        let fragment = self.shader_cache.shader(
            &self.config.fragment_template,
            &defines,
            ShaderStage::Fragment,
        );
        match (vertex, fragment) {
            (Some(vertex), Some(fragment)) => {
                let program = self.shader_cache.program(vertex, fragment);
                let state = self.writable(scene, target, &mut copied);
                state.program = Some(program);
                for (unit, role) in &textures {
                    state.set_uniform(role.clone(), UniformValue::Int(*unit as i32));
                }
            }
            _ => log::debug!(
                "shader permutation ({}, {}) did not resolve; keeping previous state",
                self.config.vertex_template,
                self.config.fragment_template
            ),
        }
    }
}

/// A companion texture mirroring the diffuse map's sampler settings.
fn synthesized_texture(
    role: &str,
    path: String,
    image: Rc<Image>,
    diffuse: &Texture,
) -> Texture {
    Texture {
        name: role.to_string(),
        width: image.width,
        height: image.height,
        source: TextureSource::Image {
            path,
            image: Some(image),
        },
        sampler: diffuse.sampler,
    }
}

/// Runs a shading pass over `root` with a fresh visitor.
///
/// Entry point mirroring [`ShaderVisitor::visit`] for hosts that do not
/// need to keep the visitor around.
pub fn apply_shading(
    scene: &mut Scene,
    root: NodeId,
    config: ShadingConfig,
    shader_cache: Rc<dyn ShaderCache>,
    vfs: Rc<dyn Vfs>,
    image_cache: Rc<dyn ImageCache>,
    light_cache: Rc<dyn LightCache>,
) {
    ShaderVisitor::new(config, shader_cache, vfs, image_cache, light_cache).visit(scene, root)
}
