//! Shader permutation keys and the shader-cache seam.
//!
//! Shader sources are opaque templates with conditional inclusion blocks
//! selected by a flat set of preprocessor defines (the [`DefineMap`]). This
//! module builds the define set for a given set of texture bindings and
//! declares the [`ShaderCache`] trait through which compiled shaders and
//! linked programs are requested. The cache is the canonical owner of
//! compiled shader objects; this crate only holds type-safe handles.
//!
//! # Define contract
//!
//! For deterministic template expansion, the define map always contains an
//! entry for *every* known texture role plus its `<role>UV` companion, even
//! when the role is absent ("0"/disabled). Roles that are bound overwrite
//! their entry to "1" and their UV companion to the bound texture unit index.

use std::collections::BTreeMap;

/// Symbolic texture role names recognized by the shader templates.
///
/// The spelling of these names is part of the wire contract with the shader
/// source text: each role doubles as a define name and as a sampler uniform
/// name bound to the matching texture unit.
pub const TEXTURE_ROLES: [&str; 9] = [
    "diffuseMap",
    "normalMap",
    "emissiveMap",
    "darkMap",
    "detailMap",
    "envMap",
    "specularMap",
    "decalMap",
    "roughnessMap",
];

/// Alias role for a combined normal+height map.
///
/// Resolves to `normalMap` during requirement merging, additionally enabling
/// the parallax path.
pub const NORMAL_HEIGHT_ROLE: &str = "normalHeightMap";

/// Returns whether `name` is one of the recognized texture roles.
pub fn is_texture_role(name: &str) -> bool {
    TEXTURE_ROLES.contains(&name)
}

/// Mapping from symbolic define names to string values.
///
/// A `BTreeMap` rather than a hash map so iteration order is deterministic:
/// the map doubles as a shader-cache key and must compare and print stably.
pub type DefineMap = BTreeMap<String, String>;

/// Builds the define map for a shader permutation.
///
/// Seeds every known role and its `<role>UV` companion with "0", then
/// overwrites the entries for each bound `(unit, role)` pair with "1" and
/// the unit index. The `parallax` define is "1" when the bound normal map
/// carries height data.
pub fn permutation_defines(textures: &BTreeMap<u32, String>, normal_height: bool) -> DefineMap {
    let mut defines = DefineMap::new();
    for role in TEXTURE_ROLES {
        defines.insert(role.to_string(), "0".to_string());
        defines.insert(format!("{role}UV"), "0".to_string());
    }
    for (unit, role) in textures {
        defines.insert(role.clone(), "1".to_string());
        defines.insert(format!("{role}UV"), unit.to_string());
    }
    defines.insert(
        "parallax".to_string(),
        if normal_height { "1" } else { "0" }.to_string(),
    );
    defines
}

/// Shader pipeline stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex stage.
    Vertex,
    /// Fragment stage.
    Fragment,
}

/// Type-safe handle to a compiled shader owned by the [`ShaderCache`].
///
/// The newtype wrapper prevents accidentally passing program handles where
/// shader handles are expected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub usize);

/// Type-safe handle to a linked shader program owned by the [`ShaderCache`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub usize);

/// The shader source cache and compiler seam.
///
/// Implemented by the host renderer. The cache owns template sources,
/// compiled shader objects, and linked programs; callers hold handles only.
/// A `(template, defines, stage)` triple identifies a compiled shader, so
/// implementations are expected to memoize on it.
///
/// Compilation failure is reported as `None`, never as a panic: a node whose
/// shaders fail to resolve silently keeps its previous render state.
pub trait ShaderCache {
    /// Requests the shader compiled from `template` against `defines`.
    ///
    /// Returns `None` when the template is missing or fails to compile.
    fn shader(&self, template: &str, defines: &DefineMap, stage: ShaderStage)
    -> Option<ShaderHandle>;

    /// Requests the program linking `vertex` and `fragment`.
    fn program(&self, vertex: ShaderHandle, fragment: ShaderHandle) -> ProgramHandle;

    /// Global defines applied to every permutation (renderer-wide switches).
    fn global_defines(&self) -> DefineMap {
        DefineMap::new()
    }
}
