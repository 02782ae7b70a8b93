// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Deferred fixed-function state objects.
//!
//! Setters only record the desired value. [`StateCache::apply_states`](super::StateCache::apply_states)
//! forwards the fields whose desired value differs from the last applied one,
//! once per draw.

use super::cache::Cached;
use ember_core::renderer::{
    AlphaMode, BlendEquation, BlendFactor, BlendFunc, Capability, Color, CompareFunction, Face,
    FrontFace, GraphicsApi, StencilOp,
};

/// A desired value paired with the value last forwarded to the context.
#[derive(Debug, Clone, Copy)]
pub struct Tracked<T> {
    desired: T,
    applied: Cached<T>,
}

impl<T: Copy + PartialEq> Tracked<T> {
    /// Creates a tracked value whose applied state is unknown.
    pub fn new(desired: T) -> Self {
        Self {
            desired,
            applied: Cached::Unknown,
        }
    }

    /// Records a new desired value.
    pub fn set(&mut self, value: T) {
        self.desired = value;
    }

    /// The desired value.
    pub fn get(&self) -> T {
        self.desired
    }

    /// Returns `true` if the next apply will forward this field.
    pub fn is_dirty(&self) -> bool {
        !self.applied.is(&self.desired)
    }

    fn take_dirty(&mut self) -> Option<T> {
        if self.is_dirty() {
            self.applied = Cached::Known(self.desired);
            Some(self.desired)
        } else {
            None
        }
    }

    /// Forgets the applied value.
    pub fn reset(&mut self) {
        self.applied.reset();
    }

    /// Returns `true` if the applied value is unknown.
    pub fn is_reset(&self) -> bool {
        self.applied.is_unknown()
    }
}

fn toggle(api: &mut dyn GraphicsApi, capability: Capability, enabled: bool) {
    if enabled {
        api.enable(capability);
    } else {
        api.disable(capability);
    }
}

/// Depth test, depth writes, culling, and depth bias.
#[derive(Debug, Clone)]
pub struct DepthCullingState {
    depth_test: Tracked<bool>,
    depth_mask: Tracked<bool>,
    depth_func: Tracked<CompareFunction>,
    cull: Tracked<bool>,
    cull_face: Tracked<Face>,
    front_face: Tracked<FrontFace>,
    z_offset: Tracked<f32>,
}

impl Default for DepthCullingState {
    fn default() -> Self {
        Self {
            depth_test: Tracked::new(true),
            depth_mask: Tracked::new(true),
            depth_func: Tracked::new(CompareFunction::LessEqual),
            cull: Tracked::new(false),
            cull_face: Tracked::new(Face::Back),
            front_face: Tracked::new(FrontFace::Ccw),
            z_offset: Tracked::new(0.0),
        }
    }
}

impl DepthCullingState {
    /// Enables or disables the depth test.
    pub fn set_depth_test(&mut self, enabled: bool) {
        self.depth_test.set(enabled);
    }

    /// Whether the depth test is requested.
    pub fn depth_test(&self) -> bool {
        self.depth_test.get()
    }

    /// Enables or disables depth writes.
    pub fn set_depth_mask(&mut self, write: bool) {
        self.depth_mask.set(write);
    }

    /// Whether depth writes are requested.
    pub fn depth_mask(&self) -> bool {
        self.depth_mask.get()
    }

    /// Sets the depth comparison.
    pub fn set_depth_func(&mut self, func: CompareFunction) {
        self.depth_func.set(func);
    }

    /// The requested depth comparison.
    pub fn depth_func(&self) -> CompareFunction {
        self.depth_func.get()
    }

    /// Enables or disables face culling.
    pub fn set_cull(&mut self, enabled: bool) {
        self.cull.set(enabled);
    }

    /// Whether face culling is requested.
    pub fn cull(&self) -> bool {
        self.cull.get()
    }

    /// Selects the culled face.
    pub fn set_cull_face(&mut self, face: Face) {
        self.cull_face.set(face);
    }

    /// Sets the front-face winding.
    pub fn set_front_face(&mut self, winding: FrontFace) {
        self.front_face.set(winding);
    }

    /// Sets the depth bias; 0 disables polygon offset.
    pub fn set_z_offset(&mut self, offset: f32) {
        self.z_offset.set(offset);
    }

    /// Returns `true` if any field differs from its applied value.
    pub fn is_dirty(&self) -> bool {
        self.depth_test.is_dirty()
            || self.depth_mask.is_dirty()
            || self.depth_func.is_dirty()
            || self.cull.is_dirty()
            || self.cull_face.is_dirty()
            || self.front_face.is_dirty()
            || self.z_offset.is_dirty()
    }

    pub(crate) fn apply(&mut self, api: &mut dyn GraphicsApi) -> u64 {
        let mut calls = 0;
        if let Some(enabled) = self.depth_test.take_dirty() {
            toggle(api, Capability::DepthTest, enabled);
            calls += 1;
        }
        if let Some(write) = self.depth_mask.take_dirty() {
            api.depth_mask(write);
            calls += 1;
        }
        if let Some(func) = self.depth_func.take_dirty() {
            api.depth_func(func);
            calls += 1;
        }
        if let Some(enabled) = self.cull.take_dirty() {
            toggle(api, Capability::CullFace, enabled);
            calls += 1;
        }
        if let Some(face) = self.cull_face.take_dirty() {
            api.cull_face(face);
            calls += 1;
        }
        if let Some(winding) = self.front_face.take_dirty() {
            api.front_face(winding);
            calls += 1;
        }
        if let Some(offset) = self.z_offset.take_dirty() {
            toggle(api, Capability::PolygonOffsetFill, offset != 0.0);
            api.polygon_offset(offset, 0.0);
            calls += 2;
        }
        calls
    }

    /// Forgets every applied value.
    pub fn reset(&mut self) {
        self.depth_test.reset();
        self.depth_mask.reset();
        self.depth_func.reset();
        self.cull.reset();
        self.cull_face.reset();
        self.front_face.reset();
        self.z_offset.reset();
    }

    pub(crate) fn is_reset(&self) -> bool {
        self.depth_test.is_reset()
            && self.depth_mask.is_reset()
            && self.depth_func.is_reset()
            && self.cull.is_reset()
            && self.cull_face.is_reset()
            && self.front_face.is_reset()
            && self.z_offset.is_reset()
    }
}

/// Stencil test configuration.
#[derive(Debug, Clone)]
pub struct StencilState {
    enabled: Tracked<bool>,
    func: Tracked<(CompareFunction, i32, u32)>,
    ops: Tracked<(StencilOp, StencilOp, StencilOp)>,
    mask: Tracked<u32>,
}

impl Default for StencilState {
    fn default() -> Self {
        Self {
            enabled: Tracked::new(false),
            func: Tracked::new((CompareFunction::Always, 1, 0xFF)),
            ops: Tracked::new((StencilOp::Keep, StencilOp::Keep, StencilOp::Replace)),
            mask: Tracked::new(0xFF),
        }
    }
}

impl StencilState {
    /// Enables or disables the stencil test.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled.set(enabled);
    }

    /// Whether the stencil test is requested.
    pub fn enabled(&self) -> bool {
        self.enabled.get()
    }

    /// Sets the comparison, reference value, and comparison mask.
    pub fn set_func(&mut self, func: CompareFunction, reference: i32, mask: u32) {
        self.func.set((func, reference, mask));
    }

    /// Sets the fail, depth-fail, and pass operations.
    pub fn set_ops(&mut self, fail: StencilOp, depth_fail: StencilOp, pass: StencilOp) {
        self.ops.set((fail, depth_fail, pass));
    }

    /// Sets the write mask.
    pub fn set_mask(&mut self, mask: u32) {
        self.mask.set(mask);
    }

    pub(crate) fn apply(&mut self, api: &mut dyn GraphicsApi) -> u64 {
        let mut calls = 0;
        if let Some(enabled) = self.enabled.take_dirty() {
            toggle(api, Capability::StencilTest, enabled);
            calls += 1;
        }
        if let Some((func, reference, mask)) = self.func.take_dirty() {
            api.stencil_func(func, reference, mask);
            calls += 1;
        }
        if let Some((fail, depth_fail, pass)) = self.ops.take_dirty() {
            api.stencil_op(fail, depth_fail, pass);
            calls += 1;
        }
        if let Some(mask) = self.mask.take_dirty() {
            api.stencil_mask(mask);
            calls += 1;
        }
        calls
    }

    /// Forgets every applied value.
    pub fn reset(&mut self) {
        self.enabled.reset();
        self.func.reset();
        self.ops.reset();
        self.mask.reset();
    }

    pub(crate) fn is_reset(&self) -> bool {
        self.enabled.is_reset() && self.func.is_reset() && self.ops.is_reset() && self.mask.is_reset()
    }
}

/// Blending configuration.
#[derive(Debug, Clone)]
pub struct AlphaState {
    blend: Tracked<bool>,
    func: Tracked<BlendFunc>,
    equation: Tracked<BlendEquation>,
    constants: Tracked<Color>,
    mode: AlphaMode,
}

impl Default for AlphaState {
    fn default() -> Self {
        Self {
            blend: Tracked::new(false),
            func: Tracked::new(BlendFunc::new(
                BlendFactor::One,
                BlendFactor::Zero,
                BlendFactor::One,
                BlendFactor::Zero,
            )),
            equation: Tracked::new(BlendEquation::Add),
            constants: Tracked::new(Color::TRANSPARENT),
            mode: AlphaMode::Disable,
        }
    }
}

impl AlphaState {
    /// Applies a blending preset.
    pub fn set_alpha_mode(&mut self, mode: AlphaMode) {
        self.mode = mode;
        match mode.blend_func() {
            Some(func) => {
                self.blend.set(true);
                self.func.set(func);
                self.equation.set(BlendEquation::Add);
            }
            None => self.blend.set(false),
        }
    }

    /// The last preset applied with [`AlphaState::set_alpha_mode`].
    pub fn alpha_mode(&self) -> AlphaMode {
        self.mode
    }

    /// Enables or disables blending without touching the factors.
    pub fn set_blend(&mut self, enabled: bool) {
        self.blend.set(enabled);
    }

    /// Whether blending is requested.
    pub fn blend(&self) -> bool {
        self.blend.get()
    }

    /// Sets explicit blend factors.
    pub fn set_blend_func(&mut self, func: BlendFunc) {
        self.func.set(func);
    }

    /// Sets the blend equation.
    pub fn set_equation(&mut self, equation: BlendEquation) {
        self.equation.set(equation);
    }

    /// Sets the constant blend color.
    pub fn set_constants(&mut self, color: Color) {
        self.constants.set(color);
    }

    pub(crate) fn apply(&mut self, api: &mut dyn GraphicsApi) -> u64 {
        let mut calls = 0;
        if let Some(enabled) = self.blend.take_dirty() {
            toggle(api, Capability::Blend, enabled);
            calls += 1;
        }
        // Factors are left stale while blending is off and forwarded once it is on.
        if !self.blend.get() {
            return calls;
        }
        if let Some(func) = self.func.take_dirty() {
            api.blend_func_separate(func);
            calls += 1;
        }
        if let Some(equation) = self.equation.take_dirty() {
            api.blend_equation(equation);
            calls += 1;
        }
        if let Some(color) = self.constants.take_dirty() {
            api.blend_color(color);
            calls += 1;
        }
        calls
    }

    /// Forgets every applied value.
    pub fn reset(&mut self) {
        self.blend.reset();
        self.func.reset();
        self.equation.reset();
        self.constants.reset();
    }

    pub(crate) fn is_reset(&self) -> bool {
        self.blend.is_reset()
            && self.func.is_reset()
            && self.equation.is_reset()
            && self.constants.is_reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_infra::graphics::headless::{GlCall, HeadlessConfig, HeadlessGl};

    #[test]
    fn tracked_value_is_dirty_until_applied() {
        let mut value = Tracked::new(3u32);
        assert!(value.is_dirty());
        assert_eq!(value.take_dirty(), Some(3));
        assert!(!value.is_dirty());
        value.set(3);
        assert!(!value.is_dirty());
        value.reset();
        assert!(value.is_reset());
        assert!(value.is_dirty());
    }

    #[test]
    fn z_offset_toggles_polygon_offset() {
        let mut gl = HeadlessGl::new(HeadlessConfig::version_2());
        let mut state = DepthCullingState::default();
        state.apply(&mut gl);
        gl.clear_calls();

        state.set_z_offset(2.0);
        assert_eq!(state.apply(&mut gl), 2);
        assert_eq!(
            gl.calls(),
            vec![
                GlCall::Enable(Capability::PolygonOffsetFill),
                GlCall::PolygonOffset(2.0, 0.0),
            ]
        );
    }

    #[test]
    fn blend_factors_wait_for_blending() {
        let mut gl = HeadlessGl::new(HeadlessConfig::version_2());
        let mut alpha = AlphaState::default();
        alpha.apply(&mut gl);
        alpha.set_blend_func(BlendFunc::new(
            BlendFactor::SrcAlpha,
            BlendFactor::OneMinusSrcAlpha,
            BlendFactor::One,
            BlendFactor::One,
        ));
        gl.clear_calls();
        alpha.apply(&mut gl);
        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::BlendFuncSeparate(_))), 0);

        alpha.set_alpha_mode(AlphaMode::Combine);
        alpha.apply(&mut gl);
        assert_eq!(alpha.alpha_mode(), AlphaMode::Combine);
        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::Enable(Capability::Blend))), 1);
        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::BlendFuncSeparate(_))), 1);
    }

    #[test]
    fn stencil_applies_in_one_pass() {
        let mut gl = HeadlessGl::new(HeadlessConfig::version_2());
        let mut stencil = StencilState::default();
        stencil.set_enabled(true);
        stencil.set_func(CompareFunction::Equal, 2, 0x0F);
        assert_eq!(stencil.apply(&mut gl), 4);
        assert!(gl.calls().contains(&GlCall::StencilFunc {
            func: CompareFunction::Equal,
            reference: 2,
            mask: 0x0F,
        }));
        assert_eq!(stencil.apply(&mut gl), 0);
    }
}
