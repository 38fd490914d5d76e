//! Per-light uniform binding against the frame's visible-light list.
//!
//! The light cache produces an ordered list of visible lights once per
//! frame. For a fixed maximum number of light slots, every state set the
//! shading visitor touches gets two uniforms per slot
//! (`pointLights[i].position` / `pointLights[i].color`), each carrying a
//! recompute hook that re-reads the current frame's list. Slots beyond the
//! frame's light count are zero-filled, so shaders can loop over the full
//! array unconditionally.
//!
//! The hook closures capture a non-owning `Rc` to the light cache and their
//! slot index at uniform-creation time; the cache must outlive every
//! uniform referencing it. Slot-to-light identity is whatever order the
//! cache returns for a frame and is not stable across frames.

use std::rc::Rc;

use glam::{Vec3, Vec4};

use crate::scene::{StateSet, UniformUpdater, UniformValue};

/// Maximum number of point-light slots wired into a state set.
pub const MAX_POINT_LIGHTS: usize = 64;

/// Intensity scale applied to light diffuse colors.
///
/// Lets lights authored against an 8-bit color range act as high-dynamic-
/// range contributions without reauthoring content.
pub const POINT_LIGHT_INTENSITY: f32 = 30_000.0;

/// One visible light for a frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameLight {
    /// World-space position (`w` carries the positional flag, unused here).
    pub position: Vec4,
    /// Diffuse color.
    pub diffuse: Vec4,
}

/// Producer of the per-frame ordered visible-light list.
///
/// Implemented by the host's light culling/collection stage. The list for a
/// frame must be ready before the update traversal runs (update-before-draw
/// ordering; no locking happens here).
pub trait LightCache {
    /// The ordered visible lights for `frame_number`.
    fn lights_for_frame(&self, frame_number: u64) -> Vec<FrameLight>;
}

/// Uniform name for a light slot's position.
pub fn light_position_name(slot: usize) -> String {
    format!("pointLights[{slot}].position")
}

/// Uniform name for a light slot's color.
pub fn light_color_name(slot: usize) -> String {
    format!("pointLights[{slot}].color")
}

/// Recompute hook for a light slot's position uniform.
///
/// Yields the light's world position as a vec3, or zero when the slot is
/// outside the frame's light list or the slot cap.
pub fn light_position_updater(cache: Rc<dyn LightCache>, slot: usize) -> UniformUpdater {
    Rc::new(move |ctx| {
        let lights = cache.lights_for_frame(ctx.frame_number);
        if slot < lights.len() && slot < MAX_POINT_LIGHTS {
            UniformValue::Vec3(lights[slot].position.truncate())
        } else {
            UniformValue::Vec3(Vec3::ZERO)
        }
    })
}

/// Recompute hook for a light slot's color uniform.
///
/// Yields the light's diffuse color scaled by [`POINT_LIGHT_INTENSITY`], or
/// zero when the slot is unpopulated.
pub fn light_color_updater(cache: Rc<dyn LightCache>, slot: usize) -> UniformUpdater {
    Rc::new(move |ctx| {
        let lights = cache.lights_for_frame(ctx.frame_number);
        if slot < lights.len() && slot < MAX_POINT_LIGHTS {
            UniformValue::Vec3(lights[slot].diffuse.truncate() * POINT_LIGHT_INTENSITY)
        } else {
            UniformValue::Vec3(Vec3::ZERO)
        }
    })
}

/// Installs position and color uniforms for every light slot.
///
/// Idempotent per name: re-installing replaces the previous uniforms.
pub fn install_point_light_uniforms(state: &mut StateSet, cache: &Rc<dyn LightCache>) {
    for slot in 0..MAX_POINT_LIGHTS {
        state.set_updated_uniform(
            light_position_name(slot),
            UniformValue::Vec3(Vec3::ZERO),
            light_position_updater(cache.clone(), slot),
        );
        state.set_updated_uniform(
            light_color_name(slot),
            UniformValue::Vec3(Vec3::ZERO),
            light_color_updater(cache.clone(), slot),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::UpdateContext;

    struct FixedLights(Vec<FrameLight>);

    impl LightCache for FixedLights {
        fn lights_for_frame(&self, _frame_number: u64) -> Vec<FrameLight> {
            self.0.clone()
        }
    }

    fn ctx() -> UpdateContext {
        UpdateContext {
            frame_number: 1,
            camera_position: Vec3::ZERO,
        }
    }

    #[test]
    fn populated_slots_read_position_and_scaled_color() {
        let cache: Rc<dyn LightCache> = Rc::new(FixedLights(vec![FrameLight {
            position: Vec4::new(10.0, 20.0, 30.0, 1.0),
            diffuse: Vec4::new(0.5, 0.25, 1.0, 1.0),
        }]));

        let position = light_position_updater(cache.clone(), 0)(&ctx());
        assert_eq!(position, UniformValue::Vec3(Vec3::new(10.0, 20.0, 30.0)));

        let color = light_color_updater(cache, 0)(&ctx());
        assert_eq!(
            color,
            UniformValue::Vec3(Vec3::new(0.5, 0.25, 1.0) * POINT_LIGHT_INTENSITY)
        );
    }

    #[test]
    fn slots_beyond_the_frame_light_count_zero_fill() {
        let cache: Rc<dyn LightCache> = Rc::new(FixedLights(vec![FrameLight {
            position: Vec4::ONE,
            diffuse: Vec4::ONE,
        }]));

        for slot in [1, 5, MAX_POINT_LIGHTS - 1, MAX_POINT_LIGHTS + 10] {
            assert_eq!(
                light_position_updater(cache.clone(), slot)(&ctx()),
                UniformValue::Vec3(Vec3::ZERO)
            );
            assert_eq!(
                light_color_updater(cache.clone(), slot)(&ctx()),
                UniformValue::Vec3(Vec3::ZERO)
            );
        }
    }

    #[test]
    fn install_wires_every_slot() {
        let cache: Rc<dyn LightCache> = Rc::new(FixedLights(Vec::new()));
        let mut state = StateSet::new();
        install_point_light_uniforms(&mut state, &cache);

        assert!(state.uniforms.contains_key(&light_position_name(0)));
        assert!(
            state
                .uniforms
                .contains_key(&light_color_name(MAX_POINT_LIGHTS - 1))
        );
        assert_eq!(state.uniforms.len(), MAX_POINT_LIGHTS * 2);
    }
}
