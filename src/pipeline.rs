//! Deferred pipeline assembly: G-buffer generation, combine pass and debug
//! overlay.
//!
//! [`build_pipeline`] constructs the node structure for one deferred view
//! inside an existing scene arena: a pre-render camera rendering the scene
//! content into an owned set of G-buffer targets, a screen-filling combine
//! pass that resolves all of them plus the frame's light list into a final
//! target, a presentation quad drawing that target to screen, and an
//! optional post-render overlay of small quads showing each G-buffer for
//! debugging.
//!
//! Every pipeline owns its [`GBufferSet`]; two pipelines built into the
//! same arena never share targets, so multiple deferred views can coexist.
//!
//! # Attachment / sampler contract
//!
//! The order of [`GBuffer::ALL`] is the wire contract between the three
//! parts of the pipeline: a buffer's position in that order *is* its color
//! attachment index on the generation camera, the texture unit the combine
//! pass binds it to, and the value of the combine shader's sampler uniform
//! named [`GBuffer::sampler_name`]. [`validate_combine_bindings`] checks
//! the assembled combine state against this contract at build time, so a
//! mismatch is a construction error instead of a black screen.

use std::rc::Rc;

use glam::{Vec2, Vec3, Vec4};

use crate::geometry::Geometry;
use crate::lights::{LightCache, MAX_POINT_LIGHTS, light_color_name, light_position_name};
use crate::scene::{
    CameraNode, CameraProjection, Drawable, NodeId, RenderOrder, SamplerSettings, Scene, StateSet,
    Texture, TextureSource, UniformValue,
};
use crate::shader::{ProgramHandle, ShaderCache, ShaderStage};

/// The G-buffer targets of a deferred view, in attachment order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GBuffer {
    /// Albedo.
    Diffuse,
    /// World-space normals.
    Normal,
    /// Roughness.
    Roughness,
    /// Specular color.
    Specular,
    /// World-space positions.
    Position,
    /// Material/stencil id.
    Stencil,
}

impl GBuffer {
    /// Every target, in attachment-index order.
    pub const ALL: [GBuffer; 6] = [
        GBuffer::Diffuse,
        GBuffer::Normal,
        GBuffer::Roughness,
        GBuffer::Specular,
        GBuffer::Position,
        GBuffer::Stencil,
    ];

    /// Color attachment index (and combine-pass texture unit).
    pub fn index(self) -> usize {
        match self {
            GBuffer::Diffuse => 0,
            GBuffer::Normal => 1,
            GBuffer::Roughness => 2,
            GBuffer::Specular => 3,
            GBuffer::Position => 4,
            GBuffer::Stencil => 5,
        }
    }

    /// Sampler uniform name in the combine shader.
    pub fn sampler_name(self) -> &'static str {
        match self {
            GBuffer::Diffuse => "diffuseMap",
            GBuffer::Normal => "normalMap",
            GBuffer::Roughness => "roughnessMap",
            GBuffer::Specular => "specularMap",
            GBuffer::Position => "posMap",
            GBuffer::Stencil => "stencilMap",
        }
    }
}

/// Texel format of every G-buffer target.
///
/// Half-float so position and normal data survive with sign and range.
pub const GBUFFER_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// The owned render targets of one deferred view: six G-buffers plus the
/// combine output.
#[derive(Clone, Debug)]
pub struct GBufferSet {
    targets: [Rc<Texture>; 6],
    final_target: Rc<Texture>,
}

impl GBufferSet {
    /// Allocates target descriptions at the given dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        let make = |name: &str| {
            Rc::new(Texture {
                name: name.to_string(),
                source: TextureSource::Target {
                    format: GBUFFER_FORMAT,
                },
                width,
                height,
                sampler: SamplerSettings {
                    address_mode_u: wgpu::AddressMode::ClampToEdge,
                    address_mode_v: wgpu::AddressMode::ClampToEdge,
                    ..SamplerSettings::default()
                },
            })
        };
        Self {
            targets: GBuffer::ALL.map(|buffer| make(buffer.sampler_name())),
            final_target: make("final"),
        }
    }

    /// The target texture for `buffer`.
    pub fn target(&self, buffer: GBuffer) -> &Rc<Texture> {
        &self.targets[buffer.index()]
    }

    /// All G-buffer targets in attachment-index order (combine output not
    /// included).
    pub fn targets(&self) -> &[Rc<Texture>; 6] {
        &self.targets
    }

    /// The combine pass's output target.
    pub fn final_target(&self) -> &Rc<Texture> {
        &self.final_target
    }
}

/// Configuration for one deferred view.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// G-buffer width in texels.
    pub width: u32,
    /// G-buffer height in texels.
    pub height: u32,
    /// Whether the post-render debug overlay is built.
    pub debug_quads: bool,
    /// Vertex template shared by the combine pass and the debug quads.
    pub display_vertex_template: String,
    /// Fragment template for the debug quads.
    pub display_fragment_template: String,
    /// Fragment template for the combine pass.
    pub combine_fragment_template: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            debug_quads: false,
            display_vertex_template: "rtt_display_vertex.glsl".to_string(),
            display_fragment_template: "rtt_display_fragment.glsl".to_string(),
            combine_fragment_template: "deferred_combine_fragment.glsl".to_string(),
        }
    }
}

/// Errors surfaced while assembling a deferred pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// A shader template failed to resolve through the cache.
    ShaderUnavailable {
        /// The template that did not resolve.
        template: String,
    },
    /// A combine-pass binding violates the attachment/sampler contract.
    BindingMismatch {
        /// Sampler role whose binding is wrong.
        role: String,
        /// The attachment index the contract requires.
        expected_unit: usize,
        /// What the assembled state actually carries, if anything.
        detail: String,
    },
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::ShaderUnavailable { template } => {
                write!(f, "shader template '{template}' failed to resolve")
            }
            PipelineError::BindingMismatch {
                role,
                expected_unit,
                detail,
            } => write!(
                f,
                "combine binding for '{role}' does not match attachment {expected_unit}: {detail}"
            ),
        }
    }
}

impl std::error::Error for PipelineError {}

/// Handles to the nodes of one assembled deferred view.
#[derive(Debug)]
pub struct DeferredPipeline {
    /// Root group holding the whole pipeline.
    pub root: NodeId,
    /// Pre-render camera writing the G-buffers.
    pub generate_camera: NodeId,
    /// Pre-render camera resolving the G-buffers into the final target.
    pub combine_camera: NodeId,
    /// The combine quad drawable (carries the lit-resolve state).
    pub combine_quad: NodeId,
    /// Nested camera drawing the final target to screen.
    pub present_camera: NodeId,
    /// Post-render debug overlay camera, when enabled.
    pub debug_camera: Option<NodeId>,
    /// The view's owned render targets.
    pub gbuffers: GBufferSet,
}

/// Checks the combine state against the attachment/sampler contract.
///
/// For every G-buffer: the texture bound at its attachment index must be
/// the set's own target, and the sampler uniform named after the buffer
/// must carry that index.
pub fn validate_combine_bindings(
    state: &StateSet,
    gbuffers: &GBufferSet,
) -> Result<(), PipelineError> {
    for buffer in GBuffer::ALL {
        let unit = buffer.index();
        let role = buffer.sampler_name();

        match state.textures.get(&(unit as u32)) {
            Some(attachment) if Rc::ptr_eq(&attachment.texture, gbuffers.target(buffer)) => {}
            Some(attachment) => {
                return Err(PipelineError::BindingMismatch {
                    role: role.to_string(),
                    expected_unit: unit,
                    detail: format!("unit {unit} holds '{}'", attachment.texture.name),
                });
            }
            None => {
                return Err(PipelineError::BindingMismatch {
                    role: role.to_string(),
                    expected_unit: unit,
                    detail: format!("no texture bound at unit {unit}"),
                });
            }
        }

        match state.uniform_value(role) {
            Some(UniformValue::Int(value)) if value == unit as i32 => {}
            Some(value) => {
                return Err(PipelineError::BindingMismatch {
                    role: role.to_string(),
                    expected_unit: unit,
                    detail: format!("sampler uniform is {value:?}"),
                });
            }
            None => {
                return Err(PipelineError::BindingMismatch {
                    role: role.to_string(),
                    expected_unit: unit,
                    detail: "sampler uniform missing".to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Builds a deferred view over `content_root` into `scene`.
///
/// The returned pipeline's `root` is a free-standing group; the host parents
/// it wherever the view belongs. The combine pass's per-light uniforms are
/// refreshed by the update traversal each frame.
pub fn build_pipeline(
    scene: &mut Scene,
    content_root: NodeId,
    shader_cache: &Rc<dyn ShaderCache>,
    light_cache: &Rc<dyn LightCache>,
    config: &PipelineConfig,
) -> Result<DeferredPipeline, PipelineError> {
    let gbuffers = GBufferSet::new(config.width, config.height);

    let root = scene.add_group();

    // Generation pass: scene content into the G-buffers.
    let generate_camera = scene.add_camera(CameraNode {
        render_order: RenderOrder::PreRender,
        clear_color: Some(Vec4::ZERO),
        clear_depth: true,
        viewport: Some((config.width, config.height)),
        attachments: gbuffers.targets().to_vec(),
        projection: CameraProjection::Inherit,
        absolute_reference_frame: false,
    });
    scene.add_child(generate_camera, content_root);
    scene.add_child(root, generate_camera);

    // Combine pass: a screen-filling quad resolving the G-buffers into the
    // final target. Added after the generation camera; pre-render passes
    // run in insertion order.
    let combine_camera = scene.add_camera(CameraNode {
        render_order: RenderOrder::PreRender,
        clear_color: Some(Vec4::ZERO),
        clear_depth: true,
        viewport: Some((config.width, config.height)),
        attachments: vec![gbuffers.final_target().clone()],
        projection: CameraProjection::Ortho2d {
            left: 0.0,
            right: 1.0,
            bottom: 0.0,
            top: 1.0,
        },
        absolute_reference_frame: true,
    });
    let combine_quad = scene.add_drawable(Drawable::Mesh(Geometry::textured_quad(
        Vec3::ZERO,
        1.0,
        1.0,
        Vec2::ONE,
    )));
    scene.add_child(combine_camera, combine_quad);
    scene.add_child(root, combine_camera);

    let mut combine_state = StateSet::new();
    for buffer in GBuffer::ALL {
        let unit = buffer.index() as u32;
        combine_state.bind_texture(unit, gbuffers.target(buffer).clone());
        combine_state.set_uniform(buffer.sampler_name(), UniformValue::Int(unit as i32));
    }
    let defines = shader_cache.global_defines();
    let vertex = shader_cache
        .shader(&config.display_vertex_template, &defines, ShaderStage::Vertex)
        .ok_or_else(|| PipelineError::ShaderUnavailable {
            template: config.display_vertex_template.clone(),
        })?;
    let fragment = shader_cache
        .shader(
            &config.combine_fragment_template,
            &defines,
            ShaderStage::Fragment,
        )
        .ok_or_else(|| PipelineError::ShaderUnavailable {
            template: config.combine_fragment_template.clone(),
        })?;
    combine_state.program = Some(shader_cache.program(vertex, fragment));

    validate_combine_bindings(&combine_state, &gbuffers)?;
    scene.set_state(combine_quad, combine_state);
    scene.node_mut(combine_quad).update = Some(combine_update_callback(light_cache.clone()));

    // Presentation: the final target drawn to screen as a full quad.
    let display = display_program(shader_cache, config)?;
    let present_camera = scene.add_camera(CameraNode {
        render_order: RenderOrder::Nested,
        clear_color: None,
        clear_depth: false,
        viewport: None,
        attachments: Vec::new(),
        projection: CameraProjection::Ortho2d {
            left: 0.0,
            right: 1.0,
            bottom: 0.0,
            top: 1.0,
        },
        absolute_reference_frame: true,
    });
    let present_quad = scene.add_drawable(Drawable::Mesh(Geometry::textured_quad(
        Vec3::ZERO,
        1.0,
        1.0,
        Vec2::ONE,
    )));
    let mut present_state = StateSet::new();
    present_state.bind_texture(0, gbuffers.final_target().clone());
    present_state.set_uniform("diffuseMap", UniformValue::Int(0));
    present_state.program = Some(display);
    scene.set_state(present_quad, present_state);
    scene.add_child(present_camera, present_quad);
    scene.add_child(root, present_camera);

    // Debug overlay: one small quad per target, drawn over everything.
    let debug_camera = if config.debug_quads {
        Some(build_debug_overlay(scene, root, &gbuffers, display))
    } else {
        None
    };

    Ok(DeferredPipeline {
        root,
        generate_camera,
        combine_camera,
        combine_quad,
        present_camera,
        debug_camera,
        gbuffers,
    })
}

/// Resolves the shared RTT display program (present quad and debug quads).
fn display_program(
    shader_cache: &Rc<dyn ShaderCache>,
    config: &PipelineConfig,
) -> Result<ProgramHandle, PipelineError> {
    let defines = shader_cache.global_defines();
    let vertex = shader_cache
        .shader(&config.display_vertex_template, &defines, ShaderStage::Vertex)
        .ok_or_else(|| PipelineError::ShaderUnavailable {
            template: config.display_vertex_template.clone(),
        })?;
    let fragment = shader_cache
        .shader(
            &config.display_fragment_template,
            &defines,
            ShaderStage::Fragment,
        )
        .ok_or_else(|| PipelineError::ShaderUnavailable {
            template: config.display_fragment_template.clone(),
        })?;
    Ok(shader_cache.program(vertex, fragment))
}

/// Per-frame resolve uniforms for the combine pass.
///
/// Unlike the per-object forward uniforms, the resolve shader receives the
/// raw light list: full vec4 positions and unscaled diffuse colors, plus
/// the populated count and the camera position. Unpopulated slots zero-fill
/// so the shader loop stays branch-free.
fn combine_update_callback(light_cache: Rc<dyn LightCache>) -> crate::scene::UpdateCallback {
    Rc::new(move |state, ctx| {
        let lights = light_cache.lights_for_frame(ctx.frame_number);
        let count = lights.len().min(MAX_POINT_LIGHTS);
        state.set_uniform("lightNumber", UniformValue::UInt(count as u32));
        state.set_uniform("cameraPos", UniformValue::Vec3(ctx.camera_position));
        for slot in 0..MAX_POINT_LIGHTS {
            let (position, diffuse) = match lights.get(slot) {
                Some(light) => (light.position, light.diffuse),
                None => (Vec4::ZERO, Vec4::ZERO),
            };
            state.set_uniform(light_position_name(slot), UniformValue::Vec4(position));
            state.set_uniform(light_color_name(slot), UniformValue::Vec4(diffuse));
        }
    })
}

/// Debug quad edge length in unit-viewport coordinates.
const DEBUG_QUAD_SIZE: f32 = 0.3;

/// Lower-left corners of the six debug quads, in [`GBuffer::ALL`] order:
/// normal, roughness and specular down the left column, diffuse, position
/// and stencil down the right.
const DEBUG_QUAD_CORNERS: [(f32, f32); 6] = [
    (0.7, 0.7),
    (0.0, 0.7),
    (0.0, 0.35),
    (0.0, 0.0),
    (0.7, 0.35),
    (0.7, 0.0),
];

fn build_debug_overlay(
    scene: &mut Scene,
    root: NodeId,
    gbuffers: &GBufferSet,
    program: ProgramHandle,
) -> NodeId {
    let camera = scene.add_camera(CameraNode {
        render_order: RenderOrder::PostRender,
        clear_color: None,
        clear_depth: true,
        viewport: None,
        attachments: Vec::new(),
        projection: CameraProjection::Ortho2d {
            left: 0.0,
            right: 1.0,
            bottom: 0.0,
            top: 1.0,
        },
        absolute_reference_frame: true,
    });

    for (buffer, (x, y)) in GBuffer::ALL.into_iter().zip(DEBUG_QUAD_CORNERS) {
        let quad = scene.add_drawable(Drawable::Mesh(Geometry::textured_quad(
            Vec3::new(x, y, 0.0),
            DEBUG_QUAD_SIZE,
            DEBUG_QUAD_SIZE,
            Vec2::ONE,
        )));
        let mut state = StateSet::new();
        state.bind_texture(0, gbuffers.target(buffer).clone());
        state.set_uniform("diffuseMap", UniformValue::Int(0));
        state.program = Some(program);
        scene.set_state(quad, state);
        scene.add_child(camera, quad);
    }

    scene.add_child(root, camera);
    camera
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lights::FrameLight;
    use crate::scene::{NodeKind, UpdateContext};
    use crate::shader::{DefineMap, ProgramHandle, ShaderHandle};

    struct StubShaders {
        fail_template: Option<&'static str>,
    }

    impl StubShaders {
        fn working() -> Rc<dyn ShaderCache> {
            Rc::new(Self {
                fail_template: None,
            })
        }

        fn failing(template: &'static str) -> Rc<dyn ShaderCache> {
            Rc::new(Self {
                fail_template: Some(template),
            })
        }
    }

    impl ShaderCache for StubShaders {
        fn shader(
            &self,
            template: &str,
            _defines: &DefineMap,
            _stage: ShaderStage,
        ) -> Option<ShaderHandle> {
            if self.fail_template == Some(template) {
                None
            } else {
                Some(ShaderHandle(template.len()))
            }
        }

        fn program(&self, vertex: ShaderHandle, fragment: ShaderHandle) -> ProgramHandle {
            ProgramHandle(vertex.0 * 1000 + fragment.0)
        }
    }

    struct OneLight;

    impl LightCache for OneLight {
        fn lights_for_frame(&self, _frame_number: u64) -> Vec<FrameLight> {
            vec![FrameLight {
                position: Vec4::new(1.0, 2.0, 3.0, 1.0),
                diffuse: Vec4::new(0.5, 0.5, 0.5, 1.0),
            }]
        }
    }

    fn build(
        scene: &mut Scene,
        config: &PipelineConfig,
    ) -> Result<DeferredPipeline, PipelineError> {
        let content = scene.add_group();
        let lights: Rc<dyn LightCache> = Rc::new(OneLight);
        build_pipeline(scene, content, &StubShaders::working(), &lights, config)
    }

    #[test]
    fn generation_camera_carries_all_targets_in_attachment_order() {
        let mut scene = Scene::new();
        let pipeline = build(&mut scene, &PipelineConfig::default()).unwrap();

        let NodeKind::Camera(camera) = &scene.node(pipeline.generate_camera).kind else {
            panic!("generation node is a camera");
        };
        assert_eq!(camera.render_order, RenderOrder::PreRender);
        assert_eq!(camera.viewport, Some((1920, 1080)));
        assert_eq!(camera.attachments.len(), 6);
        for (index, attachment) in camera.attachments.iter().enumerate() {
            assert!(Rc::ptr_eq(
                attachment,
                pipeline.gbuffers.target(GBuffer::ALL[index])
            ));
            assert!(matches!(
                attachment.source,
                TextureSource::Target {
                    format: GBUFFER_FORMAT
                }
            ));
            assert_eq!((attachment.width, attachment.height), (1920, 1080));
        }
    }

    #[test]
    fn combine_pass_renders_into_the_owned_final_target() {
        let mut scene = Scene::new();
        let pipeline = build(&mut scene, &PipelineConfig::default()).unwrap();

        let NodeKind::Camera(camera) = &scene.node(pipeline.combine_camera).kind else {
            panic!("combine node is a camera");
        };
        assert_eq!(camera.render_order, RenderOrder::PreRender);
        assert_eq!(camera.attachments.len(), 1);
        assert!(Rc::ptr_eq(
            &camera.attachments[0],
            pipeline.gbuffers.final_target()
        ));
    }

    #[test]
    fn present_pass_draws_the_final_target_to_screen() {
        let mut scene = Scene::new();
        let pipeline = build(&mut scene, &PipelineConfig::default()).unwrap();

        let NodeKind::Camera(camera) = &scene.node(pipeline.present_camera).kind else {
            panic!("present node is a camera");
        };
        assert_eq!(camera.render_order, RenderOrder::Nested);
        assert!(camera.attachments.is_empty());

        let quad = scene.node(pipeline.present_camera).children[0];
        let state = scene.state(quad).unwrap();
        assert!(Rc::ptr_eq(
            &state.textures[&0].texture,
            pipeline.gbuffers.final_target()
        ));
        assert!(state.program.is_some());
    }

    #[test]
    fn missing_display_shader_is_a_build_error() {
        let mut scene = Scene::new();
        let content = scene.add_group();
        let lights: Rc<dyn LightCache> = Rc::new(OneLight);
        let err = build_pipeline(
            &mut scene,
            content,
            &StubShaders::failing("rtt_display_fragment.glsl"),
            &lights,
            &PipelineConfig::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            PipelineError::ShaderUnavailable {
                template: "rtt_display_fragment.glsl".to_string()
            }
        );
    }

    #[test]
    fn combine_pass_sampler_uniforms_match_attachment_indices() {
        let mut scene = Scene::new();
        let pipeline = build(&mut scene, &PipelineConfig::default()).unwrap();

        let state = scene.state(pipeline.combine_quad).unwrap();
        assert!(state.program.is_some());
        for buffer in GBuffer::ALL {
            let unit = buffer.index();
            assert_eq!(
                state.uniform_value(buffer.sampler_name()),
                Some(UniformValue::Int(unit as i32))
            );
            assert!(Rc::ptr_eq(
                &state.textures[&(unit as u32)].texture,
                pipeline.gbuffers.target(buffer)
            ));
        }
        assert!(validate_combine_bindings(&state, &pipeline.gbuffers).is_ok());
    }

    #[test]
    fn validation_rejects_swapped_textures() {
        let mut scene = Scene::new();
        let pipeline = build(&mut scene, &PipelineConfig::default()).unwrap();

        let mut state = StateSet::clone(&scene.state(pipeline.combine_quad).unwrap());
        let normal = state.textures[&1].texture.clone();
        let position = state.textures[&4].texture.clone();
        state.bind_texture(1, position);
        state.bind_texture(4, normal);

        let err = validate_combine_bindings(&state, &pipeline.gbuffers).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::BindingMismatch { expected_unit: 1, .. }
        ));
    }

    #[test]
    fn validation_rejects_wrong_sampler_uniform() {
        let mut scene = Scene::new();
        let pipeline = build(&mut scene, &PipelineConfig::default()).unwrap();

        let mut state = StateSet::clone(&scene.state(pipeline.combine_quad).unwrap());
        state.set_uniform("stencilMap", UniformValue::Int(3));

        let err = validate_combine_bindings(&state, &pipeline.gbuffers).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::BindingMismatch { expected_unit: 5, .. }
        ));
    }

    #[test]
    fn missing_combine_shader_is_a_build_error() {
        let mut scene = Scene::new();
        let content = scene.add_group();
        let lights: Rc<dyn LightCache> = Rc::new(OneLight);
        let err = build_pipeline(
            &mut scene,
            content,
            &StubShaders::failing("deferred_combine_fragment.glsl"),
            &lights,
            &PipelineConfig::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            PipelineError::ShaderUnavailable {
                template: "deferred_combine_fragment.glsl".to_string()
            }
        );
    }

    #[test]
    fn update_traversal_feeds_the_resolve_uniforms() {
        let mut scene = Scene::new();
        let pipeline = build(&mut scene, &PipelineConfig::default()).unwrap();

        scene.update(
            pipeline.root,
            &UpdateContext {
                frame_number: 9,
                camera_position: Vec3::new(4.0, 5.0, 6.0),
            },
        );

        let state = scene.state(pipeline.combine_quad).unwrap();
        assert_eq!(
            state.uniform_value("lightNumber"),
            Some(UniformValue::UInt(1))
        );
        assert_eq!(
            state.uniform_value("cameraPos"),
            Some(UniformValue::Vec3(Vec3::new(4.0, 5.0, 6.0)))
        );
        // Unscaled vec4 payloads, zero-filled past the light count.
        assert_eq!(
            state.uniform_value(&light_position_name(0)),
            Some(UniformValue::Vec4(Vec4::new(1.0, 2.0, 3.0, 1.0)))
        );
        assert_eq!(
            state.uniform_value(&light_color_name(0)),
            Some(UniformValue::Vec4(Vec4::new(0.5, 0.5, 0.5, 1.0)))
        );
        assert_eq!(
            state.uniform_value(&light_position_name(1)),
            Some(UniformValue::Vec4(Vec4::ZERO))
        );
        assert_eq!(
            state.uniform_value(&light_color_name(MAX_POINT_LIGHTS - 1)),
            Some(UniformValue::Vec4(Vec4::ZERO))
        );
    }

    #[test]
    fn debug_overlay_shows_each_target_once() {
        let mut scene = Scene::new();
        let config = PipelineConfig {
            debug_quads: true,
            ..PipelineConfig::default()
        };
        let pipeline = build(&mut scene, &config).unwrap();

        let camera_id = pipeline.debug_camera.unwrap();
        let NodeKind::Camera(camera) = &scene.node(camera_id).kind else {
            panic!("overlay node is a camera");
        };
        assert_eq!(camera.render_order, RenderOrder::PostRender);
        assert_eq!(
            camera.projection,
            CameraProjection::Ortho2d {
                left: 0.0,
                right: 1.0,
                bottom: 0.0,
                top: 1.0
            }
        );

        let quads = scene.node(camera_id).children.clone();
        assert_eq!(quads.len(), 6);
        for (index, quad) in quads.iter().enumerate() {
            let state = scene.state(*quad).unwrap();
            assert!(Rc::ptr_eq(
                &state.textures[&0].texture,
                pipeline.gbuffers.target(GBuffer::ALL[index])
            ));
            assert_eq!(
                state.uniform_value("diffuseMap"),
                Some(UniformValue::Int(0))
            );
            assert!(state.program.is_some());

            let NodeKind::Drawable(drawable) = &scene.node(*quad).kind else {
                panic!("overlay child is a drawable");
            };
            let geometry = drawable.geometry().unwrap();
            let corner = geometry.positions[0];
            assert_eq!((corner.x, corner.y), DEBUG_QUAD_CORNERS[index]);
        }
    }

    #[test]
    fn overlay_corners_keep_the_conventional_layout() {
        let expected = [
            (GBuffer::Normal, (0.0, 0.7)),
            (GBuffer::Roughness, (0.0, 0.35)),
            (GBuffer::Specular, (0.0, 0.0)),
            (GBuffer::Diffuse, (0.7, 0.7)),
            (GBuffer::Position, (0.7, 0.35)),
            (GBuffer::Stencil, (0.7, 0.0)),
        ];
        for (buffer, corner) in expected {
            assert_eq!(DEBUG_QUAD_CORNERS[buffer.index()], corner);
        }
    }

    #[test]
    fn overlay_is_skipped_by_default() {
        let mut scene = Scene::new();
        let pipeline = build(&mut scene, &PipelineConfig::default()).unwrap();
        assert!(pipeline.debug_camera.is_none());
    }

    #[test]
    fn two_pipelines_own_disjoint_target_sets() {
        let mut scene = Scene::new();
        let first = build(&mut scene, &PipelineConfig::default()).unwrap();
        let second = build(&mut scene, &PipelineConfig::default()).unwrap();

        for buffer in GBuffer::ALL {
            assert!(!Rc::ptr_eq(
                first.gbuffers.target(buffer),
                second.gbuffers.target(buffer)
            ));
        }
        assert!(!Rc::ptr_eq(
            first.gbuffers.final_target(),
            second.gbuffers.final_target()
        ));
        assert_ne!(first.combine_quad, second.combine_quad);
    }
}
