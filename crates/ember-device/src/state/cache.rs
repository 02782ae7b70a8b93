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

//! The bound-state mirror of the native context.

use super::render_state::{AlphaState, DepthCullingState, StencilState};
use ember_core::math::Viewport;
use ember_core::renderer::{
    AttribPointer, BufferTarget, Capability, Color, ColorMask, FramebufferTarget, GraphicsApi,
    NativeBuffer, NativeFramebuffer, NativeProgram, NativeRenderbuffer, NativeTexture,
    NativeVertexArray, TextureBindTarget,
};

/// A mirrored slot of native state.
///
/// `Unknown` means the cache cannot vouch for the context's value, so the next
/// request is always forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cached<T> {
    /// Nothing is known about the slot.
    Unknown,
    /// The context holds this value.
    Known(T),
}

impl<T> Default for Cached<T> {
    fn default() -> Self {
        Cached::Unknown
    }
}

impl<T: PartialEq> Cached<T> {
    /// Returns `true` if the slot is known to hold `value`.
    pub fn is(&self, value: &T) -> bool {
        matches!(self, Cached::Known(current) if current == value)
    }

    /// The known value, if any.
    pub fn known(&self) -> Option<&T> {
        match self {
            Cached::Known(value) => Some(value),
            Cached::Unknown => None,
        }
    }

    /// Returns `true` if the slot is unknown.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Cached::Unknown)
    }

    /// Records `value` and returns `true` if the call must be forwarded.
    pub fn update(&mut self, value: T, force: bool) -> bool {
        if !force && self.is(&value) {
            return false;
        }
        *self = Cached::Known(value);
        true
    }

    /// Forgets the slot.
    pub fn reset(&mut self) {
        *self = Cached::Unknown;
    }
}

/// How much of the cache [`StateCache::wipe`] forgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WipeLevel {
    /// The current program and the viewport.
    Light,
    /// Everything.
    Full,
}

#[derive(Debug, Clone, Copy, Default)]
struct UnitBindings {
    texture_2d: Cached<Option<NativeTexture>>,
    cube_map: Cached<Option<NativeTexture>>,
}

impl UnitBindings {
    fn slot(&mut self, target: TextureBindTarget) -> &mut Cached<Option<NativeTexture>> {
        match target {
            TextureBindTarget::Texture2D => &mut self.texture_2d,
            TextureBindTarget::CubeMap => &mut self.cube_map,
        }
    }
}

fn slot_mut<T>(slots: &mut Vec<Cached<T>>, index: u32) -> &mut Cached<T> {
    let index = index as usize;
    if slots.len() <= index {
        slots.resize_with(index + 1, || Cached::Unknown);
    }
    &mut slots[index]
}

/// Mirrors the binding and fixed-function state of the native context and
/// suppresses calls that would not change it.
///
/// The cache is the single writer of binding state: every component that
/// binds something goes through it, which keeps the mirror equal to what the
/// context holds.
#[derive(Debug, Default)]
pub struct StateCache {
    active_texture_unit: Cached<u32>,
    texture_units: Vec<UnitBindings>,
    array_buffer: Cached<Option<NativeBuffer>>,
    element_buffer: Cached<Option<NativeBuffer>>,
    framebuffer: Cached<Option<NativeFramebuffer>>,
    renderbuffer: Cached<Option<NativeRenderbuffer>>,
    vertex_array: Cached<Option<NativeVertexArray>>,
    enabled_attributes: Vec<Cached<bool>>,
    attribute_pointers: Vec<Cached<AttribPointer>>,
    attribute_divisors: Vec<Cached<u32>>,
    program: Cached<Option<NativeProgram>>,
    viewport: Cached<Viewport>,
    scissor: Cached<Viewport>,
    scissor_test: Cached<bool>,
    color_mask: Cached<ColorMask>,
    clear_color: Cached<Color>,
    /// Depth test, depth writes, and face culling.
    pub depth_culling: DepthCullingState,
    /// Stencil test and operations.
    pub stencil: StencilState,
    /// Blending.
    pub alpha: AlphaState,
    attribute_epoch: u64,
    forwarded_calls: u64,
}

impl StateCache {
    /// Creates a cache with every slot unknown.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of state-setting calls actually forwarded to the context.
    pub fn forwarded_calls(&self) -> u64 {
        self.forwarded_calls
    }

    /// A counter bumped whenever vertex input state changes.
    ///
    /// Consumers that skip re-binding identical vertex inputs compare this
    /// value against the one they recorded after their own binding.
    pub fn attribute_epoch(&self) -> u64 {
        self.attribute_epoch
    }

    fn forwarded(&mut self) {
        self.forwarded_calls += 1;
    }

    fn touch_attributes(&mut self) {
        self.attribute_epoch += 1;
    }

    // --- Textures ---

    /// Selects the active texture unit.
    pub fn active_texture(&mut self, api: &mut dyn GraphicsApi, unit: u32, force: bool) {
        if self.active_texture_unit.update(unit, force) {
            api.active_texture(unit);
            self.forwarded();
        }
    }

    /// Binds `texture` to `target` on `unit`, activating the unit only when
    /// the binding actually changes.
    pub fn bind_texture(
        &mut self,
        api: &mut dyn GraphicsApi,
        unit: u32,
        target: TextureBindTarget,
        texture: Option<NativeTexture>,
        force: bool,
    ) {
        let idx = unit as usize;
        if self.texture_units.len() <= idx {
            self.texture_units.resize_with(idx + 1, UnitBindings::default);
        }
        if !force && self.texture_units[idx].slot(target).is(&texture) {
            return;
        }
        self.active_texture(api, unit, force);
        self.texture_units[idx].slot(target).update(texture, true);
        api.bind_texture(target, texture);
        self.forwarded();
    }

    /// The texture the cache believes is bound to `target` on `unit`.
    pub fn bound_texture(&self, unit: u32, target: TextureBindTarget) -> Cached<Option<NativeTexture>> {
        self.texture_units
            .get(unit as usize)
            .map(|u| match target {
                TextureBindTarget::Texture2D => u.texture_2d,
                TextureBindTarget::CubeMap => u.cube_map,
            })
            .unwrap_or_default()
    }

    /// Forgets every unit holding `texture`, typically before deleting it.
    pub fn forget_texture(&mut self, texture: NativeTexture) {
        for unit in &mut self.texture_units {
            for slot in [&mut unit.texture_2d, &mut unit.cube_map] {
                if slot.is(&Some(texture)) {
                    slot.reset();
                }
            }
        }
    }

    // --- Buffers ---

    /// Binds a buffer to `target`.
    ///
    /// Binding the element buffer writes into the bound vertex array, so it
    /// counts as a vertex input change.
    pub fn bind_buffer(
        &mut self,
        api: &mut dyn GraphicsApi,
        target: BufferTarget,
        buffer: Option<NativeBuffer>,
        force: bool,
    ) {
        let slot = match target {
            BufferTarget::Array => &mut self.array_buffer,
            BufferTarget::ElementArray => &mut self.element_buffer,
        };
        if slot.update(buffer, force) {
            api.bind_buffer(target, buffer);
            self.forwarded();
            if target == BufferTarget::ElementArray {
                self.touch_attributes();
            }
        }
    }

    /// The buffer the cache believes is bound to `target`.
    pub fn bound_buffer(&self, target: BufferTarget) -> Cached<Option<NativeBuffer>> {
        match target {
            BufferTarget::Array => self.array_buffer,
            BufferTarget::ElementArray => self.element_buffer,
        }
    }

    /// Forgets every slot referencing `buffer`.
    pub fn forget_buffer(&mut self, buffer: NativeBuffer) {
        if self.array_buffer.is(&Some(buffer)) {
            self.array_buffer.reset();
        }
        if self.element_buffer.is(&Some(buffer)) {
            self.element_buffer.reset();
        }
        let mut touched = false;
        for pointer in &mut self.attribute_pointers {
            if matches!(pointer, Cached::Known(p) if p.buffer == buffer) {
                pointer.reset();
                touched = true;
            }
        }
        if touched {
            self.touch_attributes();
        }
    }

    // --- Vertex input ---

    /// Binds a vertex array object.
    ///
    /// A change invalidates the per-attribute state and the element buffer
    /// binding, which belong to the vertex array.
    pub fn bind_vertex_array(
        &mut self,
        api: &mut dyn GraphicsApi,
        vao: Option<NativeVertexArray>,
        force: bool,
    ) {
        if self.vertex_array.update(vao, force) {
            api.bind_vertex_array(vao);
            self.forwarded();
            self.reset_vertex_input();
        }
    }

    /// The vertex array the cache believes is bound.
    pub fn bound_vertex_array(&self) -> Cached<Option<NativeVertexArray>> {
        self.vertex_array
    }

    /// Forgets `vao` if it is bound.
    pub fn forget_vertex_array(&mut self, vao: NativeVertexArray) {
        if self.vertex_array.is(&Some(vao)) {
            self.vertex_array.reset();
            self.reset_vertex_input();
        }
    }

    fn reset_vertex_input(&mut self) {
        self.element_buffer.reset();
        self.enabled_attributes.clear();
        self.attribute_pointers.clear();
        self.attribute_divisors.clear();
        self.touch_attributes();
    }

    /// Enables an attribute slot.
    pub fn enable_vertex_attribute(&mut self, api: &mut dyn GraphicsApi, slot: u32, force: bool) {
        if slot_mut(&mut self.enabled_attributes, slot).update(true, force) {
            api.enable_vertex_attrib_array(slot);
            self.forwarded();
            self.touch_attributes();
        }
    }

    /// Disables an attribute slot.
    pub fn disable_vertex_attribute(&mut self, api: &mut dyn GraphicsApi, slot: u32, force: bool) {
        if slot_mut(&mut self.enabled_attributes, slot).update(false, force) {
            api.disable_vertex_attrib_array(slot);
            self.forwarded();
            self.touch_attributes();
        }
    }

    /// Disables every slot known to be enabled that is not in `used`.
    pub fn disable_unused_attributes(&mut self, api: &mut dyn GraphicsApi, used: &[u32]) {
        let stale: Vec<u32> = self
            .enabled_attributes
            .iter()
            .enumerate()
            .filter(|(slot, state)| state.is(&true) && !used.contains(&(*slot as u32)))
            .map(|(slot, _)| slot as u32)
            .collect();
        for slot in stale {
            self.disable_vertex_attribute(api, slot, false);
        }
    }

    /// Returns `true` if the cache knows `slot` to be enabled.
    pub fn is_attribute_enabled(&self, slot: u32) -> bool {
        self.enabled_attributes
            .get(slot as usize)
            .is_some_and(|s| s.is(&true))
    }

    /// Points an attribute slot at a buffer, binding that buffer first.
    pub fn vertex_attrib_pointer(
        &mut self,
        api: &mut dyn GraphicsApi,
        slot: u32,
        pointer: AttribPointer,
        force: bool,
    ) {
        if !force && slot_mut(&mut self.attribute_pointers, slot).is(&pointer) {
            return;
        }
        self.bind_buffer(api, BufferTarget::Array, Some(pointer.buffer), false);
        slot_mut(&mut self.attribute_pointers, slot).update(pointer, true);
        api.vertex_attrib_pointer(slot, &pointer.layout);
        self.forwarded();
        self.touch_attributes();
    }

    /// Sets the instancing divisor of a slot.
    pub fn vertex_attrib_divisor(
        &mut self,
        api: &mut dyn GraphicsApi,
        slot: u32,
        divisor: u32,
        force: bool,
    ) {
        if slot_mut(&mut self.attribute_divisors, slot).update(divisor, force) {
            api.vertex_attrib_divisor(slot, divisor);
            self.forwarded();
            self.touch_attributes();
        }
    }

    // --- Programs ---

    /// Makes `program` current.
    pub fn use_program(&mut self, api: &mut dyn GraphicsApi, program: Option<NativeProgram>, force: bool) {
        if self.program.update(program, force) {
            api.use_program(program);
            self.forwarded();
        }
    }

    /// The program the cache believes is current.
    pub fn current_program(&self) -> Cached<Option<NativeProgram>> {
        self.program
    }

    /// Forgets `program` if it is current.
    pub fn forget_program(&mut self, program: NativeProgram) {
        if self.program.is(&Some(program)) {
            self.program.reset();
        }
    }

    // --- Framebuffers ---

    /// Binds a framebuffer for both reading and drawing.
    pub fn bind_framebuffer(
        &mut self,
        api: &mut dyn GraphicsApi,
        framebuffer: Option<NativeFramebuffer>,
        force: bool,
    ) {
        if self.framebuffer.update(framebuffer, force) {
            api.bind_framebuffer(FramebufferTarget::Framebuffer, framebuffer);
            self.forwarded();
        }
    }

    /// Binds separate read and draw framebuffers for a blit.
    ///
    /// The combined binding is unknown afterwards.
    pub fn bind_blit_framebuffers(
        &mut self,
        api: &mut dyn GraphicsApi,
        read: Option<NativeFramebuffer>,
        draw: Option<NativeFramebuffer>,
    ) {
        api.bind_framebuffer(FramebufferTarget::Read, read);
        api.bind_framebuffer(FramebufferTarget::Draw, draw);
        self.forwarded_calls += 2;
        self.framebuffer.reset();
    }

    /// The framebuffer the cache believes is bound.
    pub fn bound_framebuffer(&self) -> Cached<Option<NativeFramebuffer>> {
        self.framebuffer
    }

    /// Forgets `framebuffer` if it is bound.
    pub fn forget_framebuffer(&mut self, framebuffer: NativeFramebuffer) {
        if self.framebuffer.is(&Some(framebuffer)) {
            self.framebuffer.reset();
        }
    }

    /// Binds a renderbuffer.
    pub fn bind_renderbuffer(
        &mut self,
        api: &mut dyn GraphicsApi,
        renderbuffer: Option<NativeRenderbuffer>,
        force: bool,
    ) {
        if self.renderbuffer.update(renderbuffer, force) {
            api.bind_renderbuffer(renderbuffer);
            self.forwarded();
        }
    }

    /// Forgets `renderbuffer` if it is bound.
    pub fn forget_renderbuffer(&mut self, renderbuffer: NativeRenderbuffer) {
        if self.renderbuffer.is(&Some(renderbuffer)) {
            self.renderbuffer.reset();
        }
    }

    // --- Fixed function ---

    /// Sets the viewport.
    pub fn set_viewport(&mut self, api: &mut dyn GraphicsApi, viewport: Viewport, force: bool) {
        if self.viewport.update(viewport, force) {
            api.viewport(viewport);
            self.forwarded();
        }
    }

    /// The viewport the cache believes is set.
    pub fn viewport(&self) -> Cached<Viewport> {
        self.viewport
    }

    /// Sets the scissor rectangle.
    pub fn set_scissor(&mut self, api: &mut dyn GraphicsApi, rect: Viewport, force: bool) {
        if self.scissor.update(rect, force) {
            api.scissor(rect);
            self.forwarded();
        }
    }

    /// Enables or disables the scissor test.
    pub fn set_scissor_test(&mut self, api: &mut dyn GraphicsApi, enabled: bool, force: bool) {
        if self.scissor_test.update(enabled, force) {
            if enabled {
                api.enable(Capability::ScissorTest);
            } else {
                api.disable(Capability::ScissorTest);
            }
            self.forwarded();
        }
    }

    /// Sets the color write mask.
    pub fn set_color_mask(&mut self, api: &mut dyn GraphicsApi, mask: ColorMask, force: bool) {
        if self.color_mask.update(mask, force) {
            api.color_mask(mask);
            self.forwarded();
        }
    }

    /// Sets the clear color.
    pub fn set_clear_color(&mut self, api: &mut dyn GraphicsApi, color: Color, force: bool) {
        if self.clear_color.update(color, force) {
            api.clear_color(color);
            self.forwarded();
        }
    }

    /// Forwards pending depth, stencil, and blend changes.
    pub fn apply_states(&mut self, api: &mut dyn GraphicsApi) {
        self.forwarded_calls += self.depth_culling.apply(api);
        self.forwarded_calls += self.stencil.apply(api);
        self.forwarded_calls += self.alpha.apply(api);
    }

    // --- Invalidation ---

    /// Forgets cached state. See [`WipeLevel`].
    pub fn wipe(&mut self, level: WipeLevel) {
        self.program.reset();
        self.viewport.reset();
        if level == WipeLevel::Light {
            return;
        }
        log::trace!("Full state cache wipe");
        self.active_texture_unit.reset();
        self.texture_units.clear();
        self.array_buffer.reset();
        self.framebuffer.reset();
        self.renderbuffer.reset();
        self.vertex_array.reset();
        self.reset_vertex_input();
        self.scissor.reset();
        self.scissor_test.reset();
        self.color_mask.reset();
        self.clear_color.reset();
        self.depth_culling.reset();
        self.stencil.reset();
        self.alpha.reset();
    }

    /// Returns `true` if every slot is unknown.
    pub fn is_fully_unknown(&self) -> bool {
        self.active_texture_unit.is_unknown()
            && self.texture_units.is_empty()
            && self.array_buffer.is_unknown()
            && self.element_buffer.is_unknown()
            && self.framebuffer.is_unknown()
            && self.renderbuffer.is_unknown()
            && self.vertex_array.is_unknown()
            && self.enabled_attributes.is_empty()
            && self.attribute_pointers.is_empty()
            && self.attribute_divisors.is_empty()
            && self.program.is_unknown()
            && self.viewport.is_unknown()
            && self.scissor.is_unknown()
            && self.scissor_test.is_unknown()
            && self.color_mask.is_unknown()
            && self.clear_color.is_unknown()
            && self.depth_culling.is_reset()
            && self.stencil.is_reset()
            && self.alpha.is_reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_infra::graphics::headless::{GlCall, HeadlessConfig, HeadlessGl};

    fn setup() -> (HeadlessGl, StateCache) {
        (HeadlessGl::new(HeadlessConfig::version_2()), StateCache::new())
    }

    #[test]
    fn identical_requests_are_forwarded_once() {
        let (mut gl, mut cache) = setup();
        let viewport = Viewport::new(0, 0, 320, 240);
        cache.set_viewport(&mut gl, viewport, false);
        cache.set_viewport(&mut gl, viewport, false);
        cache.set_clear_color(&mut gl, Color::BLACK, false);
        cache.set_clear_color(&mut gl, Color::BLACK, false);

        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::Viewport(_))), 1);
        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::ClearColor(_))), 1);
        assert_eq!(cache.forwarded_calls(), 2);
    }

    #[test]
    fn force_bypasses_the_mirror() {
        let (mut gl, mut cache) = setup();
        cache.set_color_mask(&mut gl, ColorMask::ALL, false);
        cache.set_color_mask(&mut gl, ColorMask::ALL, true);
        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::ColorMask(_))), 2);
    }

    #[test]
    fn texture_binding_activates_the_unit_only_on_change() {
        let (mut gl, mut cache) = setup();
        let texture = gl.create_texture().unwrap();
        gl.clear_calls();

        cache.bind_texture(&mut gl, 3, TextureBindTarget::Texture2D, Some(texture), false);
        cache.bind_texture(&mut gl, 3, TextureBindTarget::Texture2D, Some(texture), false);

        assert_eq!(
            gl.calls(),
            vec![
                GlCall::ActiveTexture(3),
                GlCall::BindTexture(TextureBindTarget::Texture2D, Some(texture)),
            ]
        );
        assert!(cache.bound_texture(3, TextureBindTarget::Texture2D).is(&Some(texture)));
        assert!(cache.bound_texture(3, TextureBindTarget::CubeMap).is_unknown());
    }

    #[test]
    fn forgetting_a_texture_clears_every_unit() {
        let (mut gl, mut cache) = setup();
        let texture = gl.create_texture().unwrap();
        cache.bind_texture(&mut gl, 0, TextureBindTarget::Texture2D, Some(texture), false);
        cache.bind_texture(&mut gl, 1, TextureBindTarget::Texture2D, Some(texture), false);
        cache.forget_texture(texture);
        assert!(cache.bound_texture(0, TextureBindTarget::Texture2D).is_unknown());
        assert!(cache.bound_texture(1, TextureBindTarget::Texture2D).is_unknown());
    }

    #[test]
    fn vertex_array_change_invalidates_vertex_input() {
        let (mut gl, mut cache) = setup();
        let index = gl.create_buffer().unwrap();
        let vao = gl.create_vertex_array().unwrap();
        cache.bind_buffer(&mut gl, BufferTarget::ElementArray, Some(index), false);
        cache.enable_vertex_attribute(&mut gl, 0, false);
        let epoch = cache.attribute_epoch();

        cache.bind_vertex_array(&mut gl, Some(vao), false);

        assert!(cache.bound_buffer(BufferTarget::ElementArray).is_unknown());
        assert!(!cache.is_attribute_enabled(0));
        assert!(cache.attribute_epoch() > epoch);
        assert!(cache.bound_vertex_array().is(&Some(vao)));
    }

    #[test]
    fn unused_attributes_are_disabled() {
        let (mut gl, mut cache) = setup();
        for slot in 0..3 {
            cache.enable_vertex_attribute(&mut gl, slot, false);
        }
        gl.clear_calls();
        cache.disable_unused_attributes(&mut gl, &[1]);
        assert_eq!(
            gl.calls(),
            vec![
                GlCall::DisableVertexAttribArray(0),
                GlCall::DisableVertexAttribArray(2),
            ]
        );
        assert!(cache.is_attribute_enabled(1));
    }

    #[test]
    fn blit_bindings_leave_the_framebuffer_unknown() {
        let (mut gl, mut cache) = setup();
        let framebuffer = gl.create_framebuffer().unwrap();
        cache.bind_framebuffer(&mut gl, Some(framebuffer), false);
        cache.bind_blit_framebuffers(&mut gl, Some(framebuffer), None);
        assert!(cache.bound_framebuffer().is_unknown());

        gl.clear_calls();
        cache.bind_framebuffer(&mut gl, Some(framebuffer), false);
        assert_eq!(gl.call_count(), 1);
    }

    #[test]
    fn light_wipe_keeps_bindings() {
        let (mut gl, mut cache) = setup();
        let buffer = gl.create_buffer().unwrap();
        cache.bind_buffer(&mut gl, BufferTarget::Array, Some(buffer), false);
        cache.set_viewport(&mut gl, Viewport::new(0, 0, 8, 8), false);

        cache.wipe(WipeLevel::Light);
        assert!(cache.viewport().is_unknown());
        assert!(cache.bound_buffer(BufferTarget::Array).is(&Some(buffer)));
        assert!(!cache.is_fully_unknown());

        cache.wipe(WipeLevel::Full);
        assert!(cache.is_fully_unknown());
    }

    #[test]
    fn full_wipe_forwards_each_identical_request_once() {
        let (mut gl, mut cache) = setup();
        let texture = gl.create_texture().unwrap();
        let buffer = gl.create_buffer().unwrap();
        let framebuffer = gl.create_framebuffer().unwrap();
        let vao = gl.create_vertex_array().unwrap();
        let program = crate::resources::program::link_program(
            &mut gl,
            "attribute vec3 position;\nvoid main() {}\n",
            "void main() {}\n",
        )
        .unwrap();
        let viewport = Viewport::new(0, 0, 64, 32);

        let replay = |gl: &mut HeadlessGl, cache: &mut StateCache| {
            cache.bind_vertex_array(gl, Some(vao), false);
            cache.bind_texture(gl, 2, TextureBindTarget::Texture2D, Some(texture), false);
            cache.bind_buffer(gl, BufferTarget::Array, Some(buffer), false);
            cache.use_program(gl, Some(program), false);
            cache.bind_framebuffer(gl, Some(framebuffer), false);
            cache.set_viewport(gl, viewport, false);
            cache.enable_vertex_attribute(gl, 0, false);
            cache.apply_states(gl);
        };

        gl.clear_calls();
        replay(&mut gl, &mut cache);
        let state_calls = gl.call_count() - 8;
        assert!(state_calls > 0);

        cache.wipe(WipeLevel::Full);
        gl.clear_calls();
        replay(&mut gl, &mut cache);

        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::BindVertexArray(Some(_)))), 1);
        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::ActiveTexture(2))), 1);
        assert_eq!(
            gl.count_calls(|c| matches!(c, GlCall::BindTexture(_, t) if *t == Some(texture))),
            1
        );
        assert_eq!(
            gl.count_calls(|c| {
                matches!(c, GlCall::BindBuffer(BufferTarget::Array, b) if *b == Some(buffer))
            }),
            1
        );
        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::UseProgram(Some(_)))), 1);
        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::BindFramebuffer(_, Some(_)))), 1);
        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::Viewport(_))), 1);
        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::EnableVertexAttribArray(0))), 1);
        assert_eq!(gl.call_count(), 8 + state_calls);

        gl.clear_calls();
        replay(&mut gl, &mut cache);
        assert_eq!(gl.call_count(), 0);
    }

    #[test]
    fn deferred_states_forward_only_changes() {
        let (mut gl, mut cache) = setup();
        cache.apply_states(&mut gl);
        let first = gl.call_count();
        assert!(first > 0);

        gl.clear_calls();
        cache.apply_states(&mut gl);
        assert_eq!(gl.call_count(), 0);

        cache.depth_culling.set_depth_func(ember_core::renderer::CompareFunction::Greater);
        cache.apply_states(&mut gl);
        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::DepthFunc(_))), 1);
        assert_eq!(gl.call_count(), 1);
    }
}
