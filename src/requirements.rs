//! Accumulated shading requirements and the traversal stack.
//!
//! A [`ShaderRequirements`] frame records everything observed so far on the
//! path from the scene root to the current node: which texture roles are
//! bound to which units, whether any of them forces a shader, the derived
//! color mode, and which unit needs a tangent frame. The
//! [`RequirementsStack`] mirrors graph descent and ascent: entering a node
//! that carries its own render state pushes a value-copy of the current top
//! frame, leaving it pops. A child therefore starts from exactly its
//! parent's accumulated requirements and may specialize its copy without
//! ever affecting the parent's entry.

use std::collections::BTreeMap;

use crate::scene::{ColorMode, NodeId};

/// Shading requirements accumulated for one traversal frame.
#[derive(Clone, Debug)]
pub struct ShaderRequirements {
    /// True once any observed feature forces a non-trivial shader.
    pub shader_required: bool,
    /// Color mode derived from the nearest governing material.
    pub color_mode: ColorMode,
    /// Sticky: an ancestor bound an OVERRIDE material; non-PROTECTED
    /// descendants may no longer change the color mode.
    pub material_overridden: bool,
    /// The bound normal map carries height data (parallax path).
    pub normal_height: bool,
    /// Texture unit whose presence requires per-vertex tangents.
    pub tex_stage_requiring_tangents: Option<u32>,
    /// Bound texture roles keyed by unit index.
    pub textures: BTreeMap<u32, String>,
    /// The node this frame was pushed for; non-owning back-reference used
    /// to decide where a synthesized program attaches.
    pub node: Option<NodeId>,
}

impl Default for ShaderRequirements {
    fn default() -> Self {
        Self {
            shader_required: false,
            color_mode: ColorMode::default(),
            material_overridden: false,
            normal_height: false,
            tex_stage_requiring_tangents: None,
            textures: BTreeMap::new(),
            node: None,
        }
    }
}

/// The requirement stack mirroring traversal depth.
///
/// Always holds at least the root frame. Pushes and pops are driven
/// exclusively through the visitor's scoped traversal helper, which
/// guarantees each push is matched by exactly one pop on every exit path.
#[derive(Debug)]
pub struct RequirementsStack {
    frames: Vec<ShaderRequirements>,
}

impl RequirementsStack {
    /// A stack holding the root frame.
    pub fn new() -> Self {
        Self {
            frames: vec![ShaderRequirements::default()],
        }
    }

    /// Pushes a value-copy of the top frame, recording `node` as the frame
    /// owner.
    pub fn push_inherited(&mut self, node: NodeId) {
        let mut frame = self.top().clone();
        frame.node = Some(node);
        self.frames.push(frame);
    }

    /// Pops the top frame.
    ///
    /// # Panics
    ///
    /// Panics if the pop would remove the root frame; the traversal
    /// discipline makes that unreachable, so hitting it is a programming
    /// error rather than a recoverable condition.
    pub fn pop(&mut self) {
        assert!(self.frames.len() > 1, "requirement stack underflow");
        self.frames.pop();
    }

    /// The current top frame.
    pub fn top(&self) -> &ShaderRequirements {
        self.frames.last().expect("requirement stack is never empty")
    }

    /// Writable access to the current top frame.
    pub fn top_mut(&mut self) -> &mut ShaderRequirements {
        self.frames
            .last_mut()
            .expect("requirement stack is never empty")
    }

    /// Current stack depth (1 = only the root frame).
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

impl Default for RequirementsStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Scene;

    #[test]
    fn child_frames_start_as_value_copies_of_the_parent() {
        let mut scene = Scene::new();
        let parent = scene.add_group();
        let child = scene.add_group();

        let mut stack = RequirementsStack::new();
        stack.push_inherited(parent);
        stack.top_mut().shader_required = true;
        stack
            .top_mut()
            .textures
            .insert(0, "diffuseMap".to_string());

        stack.push_inherited(child);
        assert!(stack.top().shader_required);
        assert_eq!(stack.top().textures[&0], "diffuseMap");
        assert_eq!(stack.top().node, Some(child));

        // Specializing the child copy never reaches the parent frame.
        stack.top_mut().textures.insert(1, "normalMap".to_string());
        stack.pop();
        assert!(!stack.top().textures.contains_key(&1));
        assert_eq!(stack.top().node, Some(parent));
    }

    #[test]
    fn default_frame_has_the_documented_baseline() {
        let frame = ShaderRequirements::default();
        assert!(!frame.shader_required);
        assert_eq!(frame.color_mode, ColorMode::AmbientAndDiffuse);
        assert!(!frame.material_overridden);
        assert!(frame.textures.is_empty());
        assert_eq!(frame.tex_stage_requiring_tangents, None);
        assert_eq!(frame.node, None);
    }

    #[test]
    #[should_panic(expected = "underflow")]
    fn popping_the_root_frame_is_a_programming_error() {
        let mut stack = RequirementsStack::new();
        stack.pop();
    }
}
