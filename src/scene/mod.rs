//! Scene graph and render state.
//!
//! The scene is an id-arena tree ([`Scene`], [`NodeId`]) whose nodes carry
//! optional shared render state ([`StateSet`]). The shading visitor walks
//! this graph to pick shader permutations; the deferred pipeline assembler
//! builds its pass graph out of [`CameraNode`]s in the same arena.

pub mod node;
pub mod state;

pub use node::{
    CameraNode, CameraProjection, Drawable, Node, NodeId, NodeKind, RenderOrder, Scene,
    UpdateCallback,
};
pub use state::{
    ColorMode, Material, MaterialBinding, SamplerSettings, StateSet, Texture, TextureAttachment,
    TextureSource, Uniform, UniformUpdater, UniformValue, UpdateContext,
};
