//! The scene graph arena: nodes, drawables and cameras.
//!
//! Nodes live in a flat arena owned by [`Scene`] and refer to each other by
//! [`NodeId`] handles. The newtype handle keeps node references `Copy` and
//! prevents mixing them up with other index types; nothing in the crate
//! holds an owning pointer to a node besides the arena itself, so
//! back-references (such as the one a requirement frame keeps) are plain
//! ids.

use std::rc::Rc;

use glam::Vec4;

use crate::geometry::Geometry;
use crate::scene::state::{StateSet, Texture, UpdateContext};

/// Type-safe handle to a node stored in a [`Scene`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// A drawable leaf, as a closed set of kinds.
///
/// Rigged and morphing drawables draw a private working copy of their
/// geometry; adjustments apply to the replaceable *source* geometry, which
/// the capability queries below expose without downcasting.
#[derive(Clone, Debug)]
pub enum Drawable {
    /// Plain static mesh; its geometry is adjusted in place.
    Mesh(Geometry),
    /// Skinned mesh; tangent/UV adjustments go to the source geometry.
    Rig {
        /// The replaceable source geometry the rig deforms.
        source: Geometry,
    },
    /// Morph-target mesh; adjustments go to the source geometry.
    Morph {
        /// The replaceable source geometry the morpher blends.
        source: Geometry,
    },
    /// Particle system; no adjustable geometry.
    Particles,
}

impl Drawable {
    /// The directly-owned geometry of a plain mesh.
    pub fn geometry_mut(&mut self) -> Option<&mut Geometry> {
        match self {
            Drawable::Mesh(geometry) => Some(geometry),
            _ => None,
        }
    }

    /// The replaceable source geometry of a rigged or morphing drawable.
    pub fn replaceable_source_geometry_mut(&mut self) -> Option<&mut Geometry> {
        match self {
            Drawable::Rig { source } | Drawable::Morph { source } => Some(source),
            _ => None,
        }
    }

    /// Read access to whichever geometry this drawable carries.
    pub fn geometry(&self) -> Option<&Geometry> {
        match self {
            Drawable::Mesh(geometry) => Some(geometry),
            Drawable::Rig { source } | Drawable::Morph { source } => Some(source),
            Drawable::Particles => None,
        }
    }
}

/// When a camera's subtree renders relative to its siblings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderOrder {
    /// Before the main traversal (off-screen generation passes).
    PreRender,
    /// In traversal order.
    #[default]
    Nested,
    /// After the main traversal (HUD / debug overlays).
    PostRender,
}

/// Camera projection, for the cases the pipeline assembler needs.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum CameraProjection {
    /// Inherit the host view's projection.
    #[default]
    Inherit,
    /// Fixed 2D orthographic projection.
    Ortho2d {
        /// Left clip plane.
        left: f32,
        /// Right clip plane.
        right: f32,
        /// Bottom clip plane.
        bottom: f32,
        /// Top clip plane.
        top: f32,
    },
}

/// An off-screen or overlay camera node.
///
/// Color attachments are ordered: the position of a texture in
/// `attachments` *is* its color attachment index, which downstream sampler
/// bindings must match.
#[derive(Clone, Debug, Default)]
pub struct CameraNode {
    /// Render ordering relative to siblings.
    pub render_order: RenderOrder,
    /// Clear color, or `None` to skip the color clear.
    pub clear_color: Option<Vec4>,
    /// Whether the depth buffer is cleared.
    pub clear_depth: bool,
    /// Viewport dimensions, or `None` to inherit.
    pub viewport: Option<(u32, u32)>,
    /// Ordered color attachments (frame-buffer backed when non-empty).
    pub attachments: Vec<Rc<Texture>>,
    /// Projection override.
    pub projection: CameraProjection,
    /// Whether the camera ignores inherited transforms.
    pub absolute_reference_frame: bool,
}

/// What a node is.
#[derive(Clone, Debug)]
pub enum NodeKind {
    /// Pure grouping node.
    Group,
    /// Drawable leaf.
    Drawable(Drawable),
    /// Camera (off-screen pass or overlay).
    Camera(CameraNode),
}

/// Per-frame update callback attached to a node.
///
/// Runs during [`Scene::update`], before the frame is drawn, with writable
/// access to the node's state set.
pub type UpdateCallback = Rc<dyn Fn(&mut StateSet, &UpdateContext)>;

/// A scene graph node.
pub struct Node {
    /// The node's kind.
    pub kind: NodeKind,
    /// Render state, shared by reference; `None` inherits everything.
    pub state: Option<Rc<StateSet>>,
    /// Child node ids, in traversal order.
    pub children: Vec<NodeId>,
    /// Optional per-frame update callback.
    pub update: Option<UpdateCallback>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            state: None,
            children: Vec::new(),
            update: None,
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.kind)
            .field("state", &self.state.is_some())
            .field("children", &self.children)
            .field("update", &self.update.is_some())
            .finish()
    }
}

/// Arena-owned scene graph.
///
/// All node creation and lookup goes through the arena. Multiple roots can
/// coexist in one arena (the deferred pipeline builds its pass graph into
/// the same arena that holds the scene content it renders).
#[derive(Debug, Default)]
pub struct Scene {
    nodes: Vec<Node>,
}

impl Scene {
    /// Creates an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Adds a grouping node.
    pub fn add_group(&mut self) -> NodeId {
        self.add(Node::new(NodeKind::Group))
    }

    /// Adds a drawable leaf.
    pub fn add_drawable(&mut self, drawable: Drawable) -> NodeId {
        self.add(Node::new(NodeKind::Drawable(drawable)))
    }

    /// Adds a camera node.
    pub fn add_camera(&mut self, camera: CameraNode) -> NodeId {
        self.add(Node::new(NodeKind::Camera(camera)))
    }

    /// Appends `child` to `parent`'s children.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.0].children.push(child);
    }

    /// Read access to a node.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Write access to a node.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The node's state set handle, if it has one.
    pub fn state(&self, id: NodeId) -> Option<Rc<StateSet>> {
        self.nodes[id.0].state.clone()
    }

    /// Replaces the node's state set.
    pub fn set_state(&mut self, id: NodeId, state: StateSet) {
        self.nodes[id.0].state = Some(Rc::new(state));
    }

    /// Writable access to the node's state set, creating one if absent.
    ///
    /// When the state set is shared with other nodes it is copied first, so
    /// the write never leaks through an alias.
    pub fn writable_state(&mut self, id: NodeId) -> &mut StateSet {
        let slot = &mut self.nodes[id.0].state;
        let rc = slot.get_or_insert_with(|| Rc::new(StateSet::new()));
        Rc::make_mut(rc)
    }

    /// Writable access via an unconditional copy of the current state set.
    ///
    /// Unlike [`writable_state`](Self::writable_state) this always replaces
    /// the node's state with a fresh copy, leaving every external holder of
    /// the previous `Rc` untouched. Used when state modification is not
    /// allowed on shared state.
    pub fn cloned_writable_state(&mut self, id: NodeId) -> &mut StateSet {
        let slot = &mut self.nodes[id.0].state;
        let copy = match slot {
            Some(rc) => StateSet::clone(rc),
            None => StateSet::new(),
        };
        *slot = Some(Rc::new(copy));
        Rc::make_mut(slot.as_mut().expect("state was just set"))
    }

    /// Runs the update traversal from `root`.
    ///
    /// Depth-first over the subtree: each node's update callback runs with
    /// writable state, then the state's uniform recompute hooks run. The
    /// host calls this once per frame, after the light cache is populated
    /// and before any drawing.
    pub fn update(&mut self, root: NodeId, ctx: &UpdateContext) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let callback = self.nodes[id.0].update.clone();
            if callback.is_some() && self.nodes[id.0].state.is_none() {
                self.nodes[id.0].state = Some(Rc::new(StateSet::new()));
            }
            if let Some(rc) = &mut self.nodes[id.0].state {
                let state = Rc::make_mut(rc);
                if let Some(callback) = &callback {
                    callback(state, ctx);
                }
                state.refresh_uniforms(ctx);
            }
            stack.extend(self.nodes[id.0].children.iter().copied());
        }
    }
}
