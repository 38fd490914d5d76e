//! phalanx: shader permutation selection and deferred pipeline assembly for
//! scene-graph renderers.
//!
//! The crate covers the host-side half of a shader-driven renderer: deciding
//! *which* shader every part of a scene needs and wiring up the render
//! passes that consume the results. GPU resource creation stays behind thin
//! trait seams ([`ShaderCache`], [`ImageCache`], [`LightCache`], [`Vfs`]) so
//! the same logic runs against any backend, including none at all in tests.
//!
//! Three pieces fit together:
//!
//! - A [`Scene`] arena of nodes with shared render state ([`StateSet`]),
//!   drawable leaves and camera passes.
//! - The [`ShaderVisitor`], which walks a subtree accumulating shading
//!   requirements (bound texture roles, material color modes, tangent
//!   needs), discovers companion maps on disk, adjusts geometry, and
//!   attaches shader programs keyed by define permutations.
//! - [`build_pipeline`], which assembles a deferred view: a pre-render
//!   camera filling an owned G-buffer set, a combine pass resolving it
//!   against the frame's lights into a final target, a presentation quad,
//!   and an optional debug overlay — with the attachment/sampler contract
//!   validated at build time.
//!
//! ```
//! use std::rc::Rc;
//! use phalanx::{
//!     Drawable, Geometry, MemoryAssets, Scene, ShadingConfig, StateSet, Texture,
//!     apply_shading,
//! };
//! # use phalanx::{DefineMap, FrameLight, LightCache, ProgramHandle, ShaderCache,
//! #     ShaderHandle, ShaderStage};
//! # struct Shaders;
//! # impl ShaderCache for Shaders {
//! #     fn shader(&self, t: &str, _: &DefineMap, _: ShaderStage) -> Option<ShaderHandle> {
//! #         Some(ShaderHandle(t.len()))
//! #     }
//! #     fn program(&self, v: ShaderHandle, f: ShaderHandle) -> ProgramHandle {
//! #         ProgramHandle(v.0 + f.0)
//! #     }
//! # }
//! # struct Lights;
//! # impl LightCache for Lights {
//! #     fn lights_for_frame(&self, _: u64) -> Vec<FrameLight> { Vec::new() }
//! # }
//! let assets = Rc::new(MemoryAssets::new());
//! assets.insert_stub("rock.dds");
//! assets.insert_stub("rock_n.dds");
//!
//! let mut scene = Scene::new();
//! let mesh = scene.add_drawable(Drawable::Mesh(Geometry::textured_quad(
//!     glam::Vec3::ZERO, 1.0, 1.0, glam::Vec2::ONE,
//! )));
//! let mut state = StateSet::new();
//! state.bind_texture(0, Rc::new(Texture::from_path("diffuseMap", "rock.dds")));
//! scene.set_state(mesh, state);
//!
//! apply_shading(
//!     &mut scene,
//!     mesh,
//!     ShadingConfig { auto_normal_maps: true, ..ShadingConfig::default() },
//!     Rc::new(Shaders),
//!     assets.clone(),
//!     assets,
//!     Rc::new(Lights),
//! );
//! // The normal-map companion was discovered, so the mesh got a program.
//! assert!(scene.state(mesh).unwrap().program.is_some());
//! ```

pub use glam;

pub mod geometry;
pub mod lights;
pub mod pipeline;
pub mod requirements;
pub mod scene;
pub mod shader;
pub mod vfs;
pub mod visitor;

pub use geometry::Geometry;
pub use lights::{
    FrameLight, LightCache, MAX_POINT_LIGHTS, POINT_LIGHT_INTENSITY, install_point_light_uniforms,
    light_color_name, light_position_name,
};
pub use pipeline::{
    DeferredPipeline, GBUFFER_FORMAT, GBuffer, GBufferSet, PipelineConfig, PipelineError,
    build_pipeline, validate_combine_bindings,
};
pub use requirements::{RequirementsStack, ShaderRequirements};
pub use scene::{
    CameraNode, CameraProjection, ColorMode, Drawable, Material, MaterialBinding, Node, NodeId,
    NodeKind, RenderOrder, SamplerSettings, Scene, StateSet, Texture, TextureAttachment,
    TextureSource, Uniform, UniformUpdater, UniformValue, UpdateCallback, UpdateContext,
};
pub use shader::{
    DefineMap, NORMAL_HEIGHT_ROLE, ProgramHandle, ShaderCache, ShaderHandle, ShaderStage,
    TEXTURE_ROLES, is_texture_role, permutation_defines,
};
pub use vfs::{DiskAssets, Image, ImageCache, MemoryAssets, Vfs, companion_path};
pub use visitor::{ShaderVisitor, ShadingConfig, apply_shading};
