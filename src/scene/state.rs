//! Render state: textures, materials, uniforms and the per-frame update
//! context.
//!
//! A [`StateSet`] is the bundle of attributes governing how a subtree is
//! drawn: per-unit texture attachments, an optional fixed-function material,
//! named uniforms and an optional synthesized shader program. StateSets are
//! shared between nodes by `Rc`; they are `Clone` so shared state can be
//! copied on write instead of mutated through an alias.
//!
//! Uniforms may carry a per-frame recompute hook bound at creation time. The
//! hook is a plain closure with explicit captured state (typically a
//! non-owning `Rc` to a light cache plus a slot index) and is evaluated by
//! [`Scene::update`](super::Scene::update) before each frame is drawn.

use std::collections::BTreeMap;
use std::rc::Rc;

use glam::Vec3;

use crate::shader::ProgramHandle;
use crate::vfs::Image;

/// Per-frame inputs handed to update callbacks and uniform recompute hooks.
///
/// Built by the host once per frame, before the draw traversal.
#[derive(Clone, Copy, Debug)]
pub struct UpdateContext {
    /// Monotonic frame (traversal) number, used to key per-frame caches.
    pub frame_number: u64,
    /// World-space camera position for the frame.
    pub camera_position: Vec3,
}

/// How a material's color tracks per-vertex color data.
///
/// The discriminant values are the wire contract with the `colorMode`
/// shader uniform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorMode {
    /// Vertex colors ignored.
    Off = 0,
    /// Vertex colors drive emission.
    Emission = 1,
    /// Vertex colors drive ambient and diffuse.
    #[default]
    AmbientAndDiffuse = 2,
    /// Vertex colors drive ambient only.
    Ambient = 3,
}

/// Classic fixed-function material attribute.
#[derive(Clone, Copy, Debug, Default)]
pub struct Material {
    /// Color-apply mode; `AmbientAndDiffuse` when unspecified.
    pub color_mode: ColorMode,
}

/// A material binding with its state-inheritance flags.
#[derive(Clone, Copy, Debug)]
pub struct MaterialBinding {
    /// The bound material.
    pub material: Material,
    /// OVERRIDE: this material claims the subtree; descendants without
    /// PROTECTED may not change the derived color mode.
    pub overrides_children: bool,
    /// PROTECTED: this material applies even under an ancestor OVERRIDE.
    pub protected: bool,
}

impl MaterialBinding {
    /// A plain binding with neither flag set.
    pub fn new(material: Material) -> Self {
        Self {
            material,
            overrides_children: false,
            protected: false,
        }
    }
}

/// Texture wrap and filter settings.
///
/// The same vocabulary a `wgpu::SamplerDescriptor` uses, kept host-side so
/// synthesized companion maps can mirror the diffuse map's settings exactly.
#[derive(Clone, Copy, Debug)]
pub struct SamplerSettings {
    /// Wrap mode along U.
    pub address_mode_u: wgpu::AddressMode,
    /// Wrap mode along V.
    pub address_mode_v: wgpu::AddressMode,
    /// Minification filter.
    pub min_filter: wgpu::FilterMode,
    /// Magnification filter.
    pub mag_filter: wgpu::FilterMode,
    /// Filter between mip levels.
    pub mipmap_filter: wgpu::FilterMode,
    /// Anisotropy clamp; 1 disables anisotropic filtering.
    pub anisotropy_clamp: u16,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            min_filter: wgpu::FilterMode::Linear,
            mag_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            anisotropy_clamp: 1,
        }
    }
}

/// Where a texture's pixels come from.
#[derive(Clone, Debug, Default)]
pub enum TextureSource {
    /// No backing store (procedural or not yet resolved).
    #[default]
    None,
    /// An image file resolved through the virtual filesystem.
    Image {
        /// VFS path the image was (or will be) loaded from.
        path: String,
        /// Decoded pixels, once loaded.
        image: Option<Rc<Image>>,
    },
    /// An off-screen render target written by a camera pass.
    Target {
        /// Texel format of the target.
        format: wgpu::TextureFormat,
    },
}

/// A texture as seen by the scene graph.
///
/// The `name` is the symbolic role ("diffuseMap", "normalMap", ...) used for
/// shader permutation selection; an empty name on unit 0 is treated as a
/// diffuse map during requirement merging.
#[derive(Clone, Debug)]
pub struct Texture {
    /// Symbolic role name; may be empty.
    pub name: String,
    /// Pixel source.
    pub source: TextureSource,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Wrap and filter settings.
    pub sampler: SamplerSettings,
}

impl Texture {
    /// A texture backed by an image file, with default sampler settings.
    ///
    /// Dimensions stay 0 until the image is resolved.
    pub fn from_path(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: TextureSource::Image {
                path: path.into(),
                image: None,
            },
            width: 0,
            height: 0,
            sampler: SamplerSettings::default(),
        }
    }

    /// The VFS path of an image-backed texture.
    pub fn path(&self) -> Option<&str> {
        match &self.source {
            TextureSource::Image { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// A texture bound to a texture unit, with its legacy fixed-function enable
/// mode.
///
/// Normal maps are conventionally attached with the mode off so the
/// fixed-function path never samples them; the shading visitor flips the
/// mode on once a shader takes over.
#[derive(Clone, Debug)]
pub struct TextureAttachment {
    /// The bound texture, shared with whoever else references it.
    pub texture: Rc<Texture>,
    /// Legacy fixed-function enable mode for this unit.
    pub enabled: bool,
}

impl TextureAttachment {
    /// Binds `texture` with the enable mode on.
    pub fn new(texture: Rc<Texture>) -> Self {
        Self {
            texture,
            enabled: true,
        }
    }
}

/// A uniform's payload.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    /// Signed integer (sampler bindings, color mode).
    Int(i32),
    /// Unsigned integer (light counts).
    UInt(u32),
    /// Boolean flag.
    Bool(bool),
    /// Scalar float.
    Float(f32),
    /// Three-component vector.
    Vec3(Vec3),
    /// Four-component vector.
    Vec4(glam::Vec4),
}

impl UniformValue {
    /// The payload as raw bytes for host UBO upload.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            UniformValue::Int(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::UInt(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::Bool(v) => bytemuck::bytes_of(&u32::from(*v)).to_vec(),
            UniformValue::Float(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::Vec3(v) => bytemuck::cast_slice(&v.to_array()).to_vec(),
            UniformValue::Vec4(v) => bytemuck::cast_slice(&v.to_array()).to_vec(),
        }
    }
}

/// Per-frame recompute hook for a uniform.
pub type UniformUpdater = Rc<dyn Fn(&UpdateContext) -> UniformValue>;

/// A named uniform slot with an optional per-frame recompute hook.
#[derive(Clone)]
pub struct Uniform {
    /// Current payload.
    pub value: UniformValue,
    /// Recompute hook run during the update traversal.
    pub updater: Option<UniformUpdater>,
}

impl Uniform {
    /// A constant uniform.
    pub fn constant(value: UniformValue) -> Self {
        Self {
            value,
            updater: None,
        }
    }

    /// A uniform recomputed every frame by `updater`.
    pub fn updated(initial: UniformValue, updater: UniformUpdater) -> Self {
        Self {
            value: initial,
            updater: Some(updater),
        }
    }
}

impl std::fmt::Debug for Uniform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uniform")
            .field("value", &self.value)
            .field("updater", &self.updater.is_some())
            .finish()
    }
}

/// The bundle of render attributes for a subtree.
#[derive(Clone, Debug, Default)]
pub struct StateSet {
    /// Texture attachments keyed by unit index.
    pub textures: BTreeMap<u32, TextureAttachment>,
    /// Optional fixed-function material with inheritance flags.
    pub material: Option<MaterialBinding>,
    /// Named uniforms.
    pub uniforms: BTreeMap<String, Uniform>,
    /// Synthesized shader program, when one has been attached.
    pub program: Option<ProgramHandle>,
}

impl StateSet {
    /// An empty state set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `texture` at `unit` with the enable mode on.
    pub fn bind_texture(&mut self, unit: u32, texture: Rc<Texture>) {
        self.textures.insert(unit, TextureAttachment::new(texture));
    }

    /// Binds `texture` at `unit` with an explicit enable mode.
    pub fn bind_texture_with_mode(&mut self, unit: u32, texture: Rc<Texture>, enabled: bool) {
        self.textures
            .insert(unit, TextureAttachment { texture, enabled });
    }

    /// Sets a constant uniform, replacing any previous entry of that name.
    pub fn set_uniform(&mut self, name: impl Into<String>, value: UniformValue) {
        self.uniforms
            .insert(name.into(), Uniform::constant(value));
    }

    /// Adds a uniform with a per-frame recompute hook.
    pub fn set_updated_uniform(
        &mut self,
        name: impl Into<String>,
        initial: UniformValue,
        updater: UniformUpdater,
    ) {
        self.uniforms
            .insert(name.into(), Uniform::updated(initial, updater));
    }

    /// Current value of the uniform `name`, if present.
    pub fn uniform_value(&self, name: &str) -> Option<UniformValue> {
        self.uniforms.get(name).map(|u| u.value)
    }

    /// Runs every recompute hook, storing the refreshed values.
    pub fn refresh_uniforms(&mut self, ctx: &UpdateContext) {
        for uniform in self.uniforms.values_mut() {
            if let Some(updater) = &uniform.updater {
                uniform.value = updater(ctx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_mode_wire_values_are_stable() {
        assert_eq!(ColorMode::Off as i32, 0);
        assert_eq!(ColorMode::Emission as i32, 1);
        assert_eq!(ColorMode::AmbientAndDiffuse as i32, 2);
        assert_eq!(ColorMode::Ambient as i32, 3);
        assert_eq!(ColorMode::default(), ColorMode::AmbientAndDiffuse);
    }

    #[test]
    fn refresh_recomputes_only_hooked_uniforms() {
        let mut state = StateSet::new();
        state.set_uniform("colorMode", UniformValue::Int(2));
        state.set_updated_uniform(
            "frame",
            UniformValue::UInt(0),
            Rc::new(|ctx| UniformValue::UInt(ctx.frame_number as u32)),
        );

        state.refresh_uniforms(&UpdateContext {
            frame_number: 7,
            camera_position: Vec3::ZERO,
        });

        assert_eq!(state.uniform_value("frame"), Some(UniformValue::UInt(7)));
        assert_eq!(state.uniform_value("colorMode"), Some(UniformValue::Int(2)));
    }

    #[test]
    fn uniform_bytes_match_payload_size() {
        assert_eq!(UniformValue::Int(5).to_bytes().len(), 4);
        assert_eq!(UniformValue::Bool(true).to_bytes(), vec![1, 0, 0, 0]);
        assert_eq!(UniformValue::Vec3(Vec3::ONE).to_bytes().len(), 12);
    }
}
