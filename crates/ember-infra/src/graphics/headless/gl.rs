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

use super::call::GlCall;
use super::config::HeadlessConfig;
use ember_core::math::Viewport;
use ember_core::renderer::*;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct ShaderObject {
    stage: ShaderStage,
    source: String,
    compiled: bool,
    log: String,
}

#[derive(Debug, Default)]
struct ProgramObject {
    shaders: Vec<NativeShader>,
    linked: bool,
    log: String,
    attributes: Vec<String>,
    uniforms: Vec<String>,
}

#[derive(Debug, Default)]
struct VertexArrayObject {
    element_buffer: Option<NativeBuffer>,
}

#[derive(Debug, Default)]
struct HeadlessState {
    lost: bool,
    next_handle: u32,
    errors: VecDeque<ApiError>,
    calls: Vec<GlCall>,
    enabled_extensions: HashSet<Extension>,
    aliases: HashSet<EntryPointAlias>,

    buffers: HashMap<NativeBuffer, Vec<u8>>,
    bound_buffers: HashMap<BufferTarget, NativeBuffer>,
    vertex_arrays: HashMap<NativeVertexArray, VertexArrayObject>,
    bound_vertex_array: Option<NativeVertexArray>,
    textures: HashMap<NativeTexture, (u32, u32)>,
    active_unit: u32,
    bound_textures: HashMap<(u32, TextureBindTarget), NativeTexture>,
    framebuffers: HashSet<NativeFramebuffer>,
    renderbuffers: HashSet<NativeRenderbuffer>,
    shaders: HashMap<NativeShader, ShaderObject>,
    programs: HashMap<NativeProgram, ProgramObject>,
    current_program: Option<NativeProgram>,
    shader_sources: Vec<String>,
}

impl HeadlessState {
    fn next_handle(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }

    fn error(&mut self, error: ApiError) {
        self.errors.push_back(error);
    }

    fn record(&mut self, call: GlCall) {
        self.calls.push(call);
    }

    fn drop_objects(&mut self) {
        self.buffers.clear();
        self.bound_buffers.clear();
        self.vertex_arrays.clear();
        self.bound_vertex_array = None;
        self.textures.clear();
        self.bound_textures.clear();
        self.active_unit = 0;
        self.framebuffers.clear();
        self.renderbuffers.clear();
        self.shaders.clear();
        self.programs.clear();
        self.current_program = None;
        self.enabled_extensions.clear();
        self.aliases.clear();
        self.errors.clear();
    }
}

/// Extracts the declared name from a `qualifier type name;` line.
fn declared_name(line: &str) -> Option<String> {
    let declaration = line.split(';').next()?;
    let name = declaration.split_whitespace().last()?;
    let name = name.split('[').next()?;
    (!name.is_empty()).then(|| name.to_string())
}

fn reflect(source: &str, qualifiers: &[&str]) -> Vec<String> {
    source
        .lines()
        .map(str::trim)
        .filter(|line| qualifiers.iter().any(|q| line.starts_with(q)))
        .filter_map(declared_name)
        .collect()
}

/// A recording, headless graphics context.
///
/// Clones share the same context, so a test can keep one handle while the
/// device owns another.
#[derive(Debug, Clone)]
pub struct HeadlessGl {
    config: Arc<HeadlessConfig>,
    state: Arc<Mutex<HeadlessState>>,
}

impl Default for HeadlessGl {
    fn default() -> Self {
        Self::new(HeadlessConfig::default())
    }
}

impl HeadlessGl {
    /// Creates a live context.
    pub fn new(config: HeadlessConfig) -> Self {
        Self {
            config: Arc::new(config),
            state: Arc::new(Mutex::new(HeadlessState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` on a live context; calls on a lost context are dropped.
    fn live<R: Default>(&self, f: impl FnOnce(&mut HeadlessState) -> R) -> R {
        let mut state = self.state();
        if state.lost {
            return R::default();
        }
        f(&mut state)
    }

    fn is_v2(&self) -> bool {
        self.config.version == ApiVersion::V2
    }

    fn has_route(&self, state: &HeadlessState, alias: EntryPointAlias) -> bool {
        self.is_v2() || state.aliases.contains(&alias)
    }

    /// The configuration this context was created with.
    pub fn config(&self) -> &HeadlessConfig {
        &self.config
    }

    // --- Call log ---

    /// A copy of every recorded call, oldest first.
    pub fn calls(&self) -> Vec<GlCall> {
        self.state().calls.clone()
    }

    /// Counts the recorded calls matching `predicate`.
    pub fn count_calls(&self, predicate: impl Fn(&GlCall) -> bool) -> usize {
        self.state().calls.iter().filter(|c| predicate(c)).count()
    }

    /// Number of recorded calls.
    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    /// Forgets the recorded calls.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Every source handed to `shader_source`, in order.
    pub fn shader_sources(&self) -> Vec<String> {
        self.state().shader_sources.clone()
    }

    // --- Context loss ---

    /// Loses the context: every object is gone and calls are ignored.
    pub fn lose_context(&self) {
        let mut state = self.state();
        if state.lost {
            return;
        }
        state.drop_objects();
        state.lost = true;
        log::debug!("Headless context lost");
    }

    /// Makes the context usable again, empty.
    pub fn restore_context(&self) {
        let mut state = self.state();
        state.lost = false;
        state.errors.clear();
        log::debug!("Headless context restored");
    }

    /// Queues an error for the next `get_error`.
    pub fn push_error(&self, error: ApiError) {
        self.state().error(error);
    }

    // --- Object inspection ---

    /// Returns `true` if `alias` was installed.
    pub fn has_alias(&self, alias: EntryPointAlias) -> bool {
        self.state().aliases.contains(&alias)
    }

    /// Returns `true` if `extension` was enabled.
    pub fn is_extension_enabled(&self, extension: Extension) -> bool {
        self.state().enabled_extensions.contains(&extension)
    }

    /// Number of live buffers.
    pub fn live_buffers(&self) -> usize {
        self.state().buffers.len()
    }

    /// Number of live textures.
    pub fn live_textures(&self) -> usize {
        self.state().textures.len()
    }

    /// Number of live framebuffers.
    pub fn live_framebuffers(&self) -> usize {
        self.state().framebuffers.len()
    }

    /// Number of live renderbuffers.
    pub fn live_renderbuffers(&self) -> usize {
        self.state().renderbuffers.len()
    }

    /// Number of live vertex arrays.
    pub fn live_vertex_arrays(&self) -> usize {
        self.state().vertex_arrays.len()
    }

    /// Number of live shader objects.
    pub fn live_shaders(&self) -> usize {
        self.state().shaders.len()
    }

    /// Number of live programs.
    pub fn live_programs(&self) -> usize {
        self.state().programs.len()
    }

    /// The bytes stored in a buffer.
    pub fn buffer_contents(&self, buffer: NativeBuffer) -> Option<Vec<u8>> {
        self.state().buffers.get(&buffer).cloned()
    }

    /// The size of level 0 of a texture.
    pub fn texture_size(&self, texture: NativeTexture) -> Option<(u32, u32)> {
        self.state().textures.get(&texture).copied()
    }

    /// The current program.
    pub fn current_program(&self) -> Option<NativeProgram> {
        self.state().current_program
    }

    /// The buffer bound to `target`, honoring the bound vertex array for the
    /// element target.
    pub fn bound_buffer(&self, target: BufferTarget) -> Option<NativeBuffer> {
        let state = self.state();
        Self::bound_buffer_in(&state, target)
    }

    fn bound_buffer_in(state: &HeadlessState, target: BufferTarget) -> Option<NativeBuffer> {
        if target == BufferTarget::ElementArray {
            if let Some(vao) = state.bound_vertex_array {
                return state.vertex_arrays.get(&vao).and_then(|v| v.element_buffer);
            }
        }
        state.bound_buffers.get(&target).copied()
    }

    fn create<H>(&self, make: impl FnOnce(u32) -> H, register: impl FnOnce(&mut HeadlessState, H) -> GlCall) -> Option<H>
    where
        H: Copy,
    {
        let mut state = self.state();
        if state.lost {
            return None;
        }
        let handle = make(state.next_handle());
        let call = register(&mut state, handle);
        state.record(call);
        Some(handle)
    }
}

impl GraphicsApi for HeadlessGl {
    // --- Context ---

    fn api_version(&self) -> ApiVersion {
        self.config.version
    }

    fn is_context_lost(&self) -> bool {
        self.state().lost
    }

    fn get_string(&self, name: ApiString) -> String {
        match name {
            ApiString::Vendor => self.config.vendor.clone(),
            ApiString::Renderer => self.config.renderer.clone(),
            ApiString::Version => format!("Headless {}.0", self.config.version.major()),
        }
    }

    fn get_limit(&self, limit: Limit) -> u32 {
        if self.state().lost {
            return 0;
        }
        let config = &self.config;
        match limit {
            Limit::MaxTextureImageUnits => config.max_texture_units,
            Limit::MaxCombinedTextureImageUnits => config.max_combined_texture_units,
            Limit::MaxVertexTextureImageUnits => config.max_vertex_texture_units,
            Limit::MaxTextureSize => config.max_texture_size,
            Limit::MaxCubeMapTextureSize => config.max_cube_map_size,
            Limit::MaxRenderbufferSize => config.max_render_buffer_size,
            Limit::MaxVertexAttribs => config.max_vertex_attribs,
            Limit::MaxSamples if self.is_v2() => config.max_samples,
            Limit::MaxSamples => 0,
            Limit::MaxTextureMaxAnisotropy => config.max_anisotropy,
            Limit::MaxDrawBuffers => config.max_draw_buffers,
        }
    }

    fn high_float_precision(&self, _stage: ShaderStage) -> bool {
        self.config.high_precision
    }

    fn enable_extension(&mut self, extension: Extension) -> bool {
        let available = self.config.extensions.contains(&extension);
        self.live(|state| {
            if available {
                state.enabled_extensions.insert(extension);
            }
            available
        })
    }

    fn alias_entry_point(&mut self, alias: EntryPointAlias) -> bool {
        let extension = HeadlessConfig::alias_extension(alias);
        let v2 = self.is_v2();
        self.live(|state| {
            if v2 {
                return true;
            }
            if !state.enabled_extensions.contains(&extension) {
                return false;
            }
            state.aliases.insert(alias);
            true
        })
    }

    fn get_error(&mut self) -> ApiError {
        let mut state = self.state();
        if state.lost {
            return ApiError::ContextLost;
        }
        state.errors.pop_front().unwrap_or_default()
    }

    // --- Buffers ---

    fn create_buffer(&mut self) -> Option<NativeBuffer> {
        self.create(NativeBuffer, |state, buffer| {
            state.buffers.insert(buffer, Vec::new());
            GlCall::CreateBuffer(buffer)
        })
    }

    fn delete_buffer(&mut self, buffer: NativeBuffer) {
        self.live(|state| {
            if state.buffers.remove(&buffer).is_none() {
                state.error(ApiError::InvalidValue);
                return;
            }
            state.bound_buffers.retain(|_, b| *b != buffer);
            for vao in state.vertex_arrays.values_mut() {
                if vao.element_buffer == Some(buffer) {
                    vao.element_buffer = None;
                }
            }
            state.record(GlCall::DeleteBuffer(buffer));
        })
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<NativeBuffer>) {
        self.live(|state| {
            if let Some(b) = buffer {
                if !state.buffers.contains_key(&b) {
                    state.error(ApiError::InvalidOperation);
                    return;
                }
            }
            let in_vao = target == BufferTarget::ElementArray
                && state.bound_vertex_array.is_some();
            if in_vao {
                if let Some(vao) = state
                    .bound_vertex_array
                    .and_then(|v| state.vertex_arrays.get_mut(&v))
                {
                    vao.element_buffer = buffer;
                }
            } else {
                match buffer {
                    Some(b) => state.bound_buffers.insert(target, b),
                    None => state.bound_buffers.remove(&target),
                };
            }
            state.record(GlCall::BindBuffer(target, buffer));
        })
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsageHint) {
        self.live(|state| {
            let Some(buffer) = Self::bound_buffer_in(state, target) else {
                state.error(ApiError::InvalidOperation);
                return;
            };
            state.buffers.insert(buffer, data.to_vec());
            state.record(GlCall::BufferData {
                target,
                size: data.len(),
                usage,
            });
        })
    }

    fn buffer_data_size(&mut self, target: BufferTarget, size: usize, usage: BufferUsageHint) {
        self.live(|state| {
            let Some(buffer) = Self::bound_buffer_in(state, target) else {
                state.error(ApiError::InvalidOperation);
                return;
            };
            state.buffers.insert(buffer, vec![0; size]);
            state.record(GlCall::BufferData { target, size, usage });
        })
    }

    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) {
        self.live(|state| {
            let Some(buffer) = Self::bound_buffer_in(state, target) else {
                state.error(ApiError::InvalidOperation);
                return;
            };
            let Some(contents) = state.buffers.get_mut(&buffer) else {
                state.error(ApiError::InvalidOperation);
                return;
            };
            let end = offset + data.len();
            if end > contents.len() {
                state.error(ApiError::InvalidValue);
                return;
            }
            contents[offset..end].copy_from_slice(data);
            state.record(GlCall::BufferSubData {
                target,
                offset,
                size: data.len(),
            });
        })
    }

    // --- Vertex input ---

    fn create_vertex_array(&mut self) -> Option<NativeVertexArray> {
        let routed = self.has_route(&self.state(), EntryPointAlias::VertexArrayObject);
        if !routed {
            self.state().error(ApiError::InvalidOperation);
            return None;
        }
        self.create(NativeVertexArray, |state, vao| {
            state.vertex_arrays.insert(vao, VertexArrayObject::default());
            GlCall::CreateVertexArray(vao)
        })
    }

    fn delete_vertex_array(&mut self, vao: NativeVertexArray) {
        self.live(|state| {
            if state.vertex_arrays.remove(&vao).is_none() {
                state.error(ApiError::InvalidValue);
                return;
            }
            if state.bound_vertex_array == Some(vao) {
                state.bound_vertex_array = None;
            }
            state.record(GlCall::DeleteVertexArray(vao));
        })
    }

    fn bind_vertex_array(&mut self, vao: Option<NativeVertexArray>) {
        let v2 = self.is_v2();
        self.live(|state| {
            if !v2 && !state.aliases.contains(&EntryPointAlias::VertexArrayObject) {
                state.error(ApiError::InvalidOperation);
                return;
            }
            if let Some(v) = vao {
                if !state.vertex_arrays.contains_key(&v) {
                    state.error(ApiError::InvalidOperation);
                    return;
                }
            }
            state.bound_vertex_array = vao;
            state.record(GlCall::BindVertexArray(vao));
        })
    }

    fn enable_vertex_attrib_array(&mut self, slot: u32) {
        let max = self.config.max_vertex_attribs;
        self.live(|state| {
            if slot >= max {
                state.error(ApiError::InvalidValue);
                return;
            }
            state.record(GlCall::EnableVertexAttribArray(slot));
        })
    }

    fn disable_vertex_attrib_array(&mut self, slot: u32) {
        let max = self.config.max_vertex_attribs;
        self.live(|state| {
            if slot >= max {
                state.error(ApiError::InvalidValue);
                return;
            }
            state.record(GlCall::DisableVertexAttribArray(slot));
        })
    }

    fn vertex_attrib_pointer(&mut self, slot: u32, layout: &VertexLayout) {
        self.live(|state| {
            if !state.bound_buffers.contains_key(&BufferTarget::Array) {
                state.error(ApiError::InvalidOperation);
                return;
            }
            state.record(GlCall::VertexAttribPointer(slot, *layout));
        })
    }

    fn vertex_attrib_divisor(&mut self, slot: u32, divisor: u32) {
        let v2 = self.is_v2();
        self.live(|state| {
            if !v2 && !state.aliases.contains(&EntryPointAlias::InstancedArrays) {
                state.error(ApiError::InvalidOperation);
                return;
            }
            state.record(GlCall::VertexAttribDivisor(slot, divisor));
        })
    }

    // --- Textures ---

    fn create_texture(&mut self) -> Option<NativeTexture> {
        self.create(NativeTexture, |state, texture| {
            state.textures.insert(texture, (0, 0));
            GlCall::CreateTexture(texture)
        })
    }

    fn delete_texture(&mut self, texture: NativeTexture) {
        self.live(|state| {
            if state.textures.remove(&texture).is_none() {
                state.error(ApiError::InvalidValue);
                return;
            }
            state.bound_textures.retain(|_, t| *t != texture);
            state.record(GlCall::DeleteTexture(texture));
        })
    }

    fn active_texture(&mut self, unit: u32) {
        let max = self.config.max_combined_texture_units;
        self.live(|state| {
            if unit >= max {
                state.error(ApiError::InvalidEnum);
                return;
            }
            state.active_unit = unit;
            state.record(GlCall::ActiveTexture(unit));
        })
    }

    fn bind_texture(&mut self, target: TextureBindTarget, texture: Option<NativeTexture>) {
        self.live(|state| {
            let key = (state.active_unit, target);
            match texture {
                Some(t) if !state.textures.contains_key(&t) => {
                    state.error(ApiError::InvalidOperation);
                    return;
                }
                Some(t) => state.bound_textures.insert(key, t),
                None => state.bound_textures.remove(&key),
            };
            state.record(GlCall::BindTexture(target, texture));
        })
    }

    fn tex_image_2d(
        &mut self,
        target: TexImageTarget,
        level: u32,
        width: u32,
        height: u32,
        format: TextureFormat,
        ty: TextureType,
        data: Option<&[u8]>,
    ) {
        let max = self.config.max_texture_size;
        self.live(|state| {
            let key = (state.active_unit, target.bind_target());
            let Some(&texture) = state.bound_textures.get(&key) else {
                state.error(ApiError::InvalidOperation);
                return;
            };
            if width > max || height > max {
                state.error(ApiError::InvalidValue);
                return;
            }
            if level == 0 {
                state.textures.insert(texture, (width, height));
            }
            state.record(GlCall::TexImage2D {
                target,
                level,
                width,
                height,
                format,
                ty,
                has_data: data.is_some(),
            });
        })
    }

    fn compressed_tex_image_2d(
        &mut self,
        target: TexImageTarget,
        level: u32,
        format: CompressedFormat,
        width: u32,
        height: u32,
        data: &[u8],
    ) {
        self.live(|state| {
            let key = (state.active_unit, target.bind_target());
            let Some(&texture) = state.bound_textures.get(&key) else {
                state.error(ApiError::InvalidOperation);
                return;
            };
            if level == 0 {
                state.textures.insert(texture, (width, height));
            }
            state.record(GlCall::CompressedTexImage2D {
                target,
                level,
                format,
                width,
                height,
                size: data.len(),
            });
        })
    }

    fn tex_image_external(&mut self, target: TexImageTarget, frame: &ExternalFrame) {
        let supported = self.config.direct_external_upload;
        self.live(|state| {
            let key = (state.active_unit, target.bind_target());
            let Some(&texture) = state.bound_textures.get(&key) else {
                state.error(ApiError::InvalidOperation);
                return;
            };
            if !supported {
                state.error(ApiError::InvalidOperation);
                return;
            }
            state.textures.insert(texture, (frame.width, frame.height));
            state.record(GlCall::TexImageExternal {
                target,
                width: frame.width,
                height: frame.height,
            });
        })
    }

    fn tex_parameter(&mut self, target: TextureBindTarget, parameter: TexParameter) {
        self.live(|state| state.record(GlCall::TexParameter(target, parameter)))
    }

    fn generate_mipmap(&mut self, target: TextureBindTarget) {
        self.live(|state| {
            if !state.bound_textures.contains_key(&(state.active_unit, target)) {
                state.error(ApiError::InvalidOperation);
                return;
            }
            state.record(GlCall::GenerateMipmap(target));
        })
    }

    fn pixel_store(&mut self, parameter: PixelStore) {
        self.live(|state| state.record(GlCall::PixelStore(parameter)))
    }

    // --- Framebuffers ---

    fn create_framebuffer(&mut self) -> Option<NativeFramebuffer> {
        self.create(NativeFramebuffer, |state, framebuffer| {
            state.framebuffers.insert(framebuffer);
            GlCall::CreateFramebuffer(framebuffer)
        })
    }

    fn delete_framebuffer(&mut self, framebuffer: NativeFramebuffer) {
        self.live(|state| {
            if !state.framebuffers.remove(&framebuffer) {
                state.error(ApiError::InvalidValue);
                return;
            }
            state.record(GlCall::DeleteFramebuffer(framebuffer));
        })
    }

    fn bind_framebuffer(&mut self, target: FramebufferTarget, framebuffer: Option<NativeFramebuffer>) {
        self.live(|state| {
            if framebuffer.is_some_and(|f| !state.framebuffers.contains(&f)) {
                state.error(ApiError::InvalidOperation);
                return;
            }
            state.record(GlCall::BindFramebuffer(target, framebuffer));
        })
    }

    fn framebuffer_texture_2d(
        &mut self,
        target: FramebufferTarget,
        attachment: Attachment,
        image: TexImageTarget,
        texture: Option<NativeTexture>,
        level: u32,
    ) {
        self.live(|state| {
            state.record(GlCall::FramebufferTexture2D {
                target,
                attachment,
                image,
                texture,
                level,
            })
        })
    }

    fn create_renderbuffer(&mut self) -> Option<NativeRenderbuffer> {
        self.create(NativeRenderbuffer, |state, renderbuffer| {
            state.renderbuffers.insert(renderbuffer);
            GlCall::CreateRenderbuffer(renderbuffer)
        })
    }

    fn delete_renderbuffer(&mut self, renderbuffer: NativeRenderbuffer) {
        self.live(|state| {
            if !state.renderbuffers.remove(&renderbuffer) {
                state.error(ApiError::InvalidValue);
                return;
            }
            state.record(GlCall::DeleteRenderbuffer(renderbuffer));
        })
    }

    fn bind_renderbuffer(&mut self, renderbuffer: Option<NativeRenderbuffer>) {
        self.live(|state| state.record(GlCall::BindRenderbuffer(renderbuffer)))
    }

    fn renderbuffer_storage(
        &mut self,
        format: RenderbufferFormat,
        width: u32,
        height: u32,
        samples: u32,
    ) {
        let max_samples = if self.is_v2() { self.config.max_samples } else { 1 };
        self.live(|state| {
            if samples > max_samples.max(1) {
                state.error(ApiError::InvalidValue);
                return;
            }
            state.record(GlCall::RenderbufferStorage {
                format,
                width,
                height,
                samples,
            });
        })
    }

    fn framebuffer_renderbuffer(
        &mut self,
        target: FramebufferTarget,
        attachment: Attachment,
        renderbuffer: Option<NativeRenderbuffer>,
    ) {
        self.live(|state| {
            state.record(GlCall::FramebufferRenderbuffer {
                target,
                attachment,
                renderbuffer,
            })
        })
    }

    fn blit_framebuffer(&mut self, src: Viewport, dst: Viewport, mask: ClearMask, filter: BlitFilter) {
        let v2 = self.is_v2();
        self.live(|state| {
            if !v2 {
                state.error(ApiError::InvalidOperation);
                return;
            }
            state.record(GlCall::BlitFramebuffer {
                src,
                dst,
                mask,
                filter,
            });
        })
    }

    fn draw_buffers(&mut self, count: u32) {
        let v2 = self.is_v2();
        let max = self.config.max_draw_buffers;
        self.live(|state| {
            if !v2 && !state.aliases.contains(&EntryPointAlias::DrawBuffers) {
                state.error(ApiError::InvalidOperation);
                return;
            }
            if count > max {
                state.error(ApiError::InvalidValue);
                return;
            }
            state.record(GlCall::DrawBuffers(count));
        })
    }

    // --- Shaders and programs ---

    fn create_shader(&mut self, stage: ShaderStage) -> Option<NativeShader> {
        self.create(NativeShader, |state, shader| {
            state.shaders.insert(
                shader,
                ShaderObject {
                    stage,
                    source: String::new(),
                    compiled: false,
                    log: String::new(),
                },
            );
            GlCall::CreateShader(shader, stage)
        })
    }

    fn shader_source(&mut self, shader: NativeShader, source: &str) {
        self.live(|state| {
            let Some(object) = state.shaders.get_mut(&shader) else {
                state.error(ApiError::InvalidValue);
                return;
            };
            object.source = source.to_string();
            state.shader_sources.push(source.to_string());
            state.record(GlCall::ShaderSource(shader));
        })
    }

    fn compile_shader(&mut self, shader: NativeShader) {
        self.live(|state| {
            let Some(object) = state.shaders.get_mut(&shader) else {
                state.error(ApiError::InvalidValue);
                return;
            };
            let failure = object
                .source
                .lines()
                .enumerate()
                .find_map(|(i, line)| {
                    line.trim()
                        .strip_prefix("#error")
                        .map(|message| (i + 1, message.trim().to_string()))
                });
            match failure {
                Some((line, message)) => {
                    object.compiled = false;
                    object.log = format!("ERROR: 0:{line}: '#error' : {message}");
                }
                None => {
                    object.compiled = true;
                    object.log.clear();
                }
            }
            state.record(GlCall::CompileShader(shader));
        })
    }

    fn shader_compile_status(&self, shader: NativeShader) -> bool {
        self.state().shaders.get(&shader).is_some_and(|s| s.compiled)
    }

    fn shader_info_log(&self, shader: NativeShader) -> String {
        self.state()
            .shaders
            .get(&shader)
            .map(|s| s.log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: NativeShader) {
        self.live(|state| {
            if state.shaders.remove(&shader).is_none() {
                state.error(ApiError::InvalidValue);
                return;
            }
            state.record(GlCall::DeleteShader(shader));
        })
    }

    fn create_program(&mut self) -> Option<NativeProgram> {
        self.create(NativeProgram, |state, program| {
            state.programs.insert(program, ProgramObject::default());
            GlCall::CreateProgram(program)
        })
    }

    fn attach_shader(&mut self, program: NativeProgram, shader: NativeShader) {
        self.live(|state| {
            if !state.shaders.contains_key(&shader) {
                state.error(ApiError::InvalidValue);
                return;
            }
            let Some(object) = state.programs.get_mut(&program) else {
                state.error(ApiError::InvalidValue);
                return;
            };
            object.shaders.push(shader);
            state.record(GlCall::AttachShader(program, shader));
        })
    }

    fn link_program(&mut self, program: NativeProgram) {
        self.live(|state| {
            let Some(object) = state.programs.get(&program) else {
                state.error(ApiError::InvalidValue);
                return;
            };
            let stages: Vec<&ShaderObject> = object
                .shaders
                .iter()
                .filter_map(|s| state.shaders.get(s))
                .collect();
            let vertex = stages.iter().find(|s| s.stage == ShaderStage::Vertex);
            let fragment = stages.iter().find(|s| s.stage == ShaderStage::Fragment);
            let outcome = match (vertex, fragment) {
                (Some(v), Some(f)) if v.compiled && f.compiled => {
                    let attributes = reflect(&v.source, &["attribute ", "in "]);
                    let mut uniforms = reflect(&v.source, &["uniform "]);
                    for name in reflect(&f.source, &["uniform "]) {
                        if !uniforms.contains(&name) {
                            uniforms.push(name);
                        }
                    }
                    Ok((attributes, uniforms))
                }
                (Some(_), Some(_)) => Err("one or more attached shaders failed to compile"),
                _ => Err("a vertex and a fragment shader must be attached"),
            };
            if let Some(object) = state.programs.get_mut(&program) {
                match outcome {
                    Ok((attributes, uniforms)) => {
                        object.linked = true;
                        object.log.clear();
                        object.attributes = attributes;
                        object.uniforms = uniforms;
                    }
                    Err(message) => {
                        object.linked = false;
                        object.log = format!("Link error: {message}");
                    }
                }
            }
            state.record(GlCall::LinkProgram(program));
        })
    }

    fn program_link_status(&self, program: NativeProgram) -> bool {
        self.state().programs.get(&program).is_some_and(|p| p.linked)
    }

    fn program_info_log(&self, program: NativeProgram) -> String {
        self.state()
            .programs
            .get(&program)
            .map(|p| p.log.clone())
            .unwrap_or_default()
    }

    fn delete_program(&mut self, program: NativeProgram) {
        self.live(|state| {
            if state.programs.remove(&program).is_none() {
                state.error(ApiError::InvalidValue);
                return;
            }
            if state.current_program == Some(program) {
                state.current_program = None;
            }
            state.record(GlCall::DeleteProgram(program));
        })
    }

    fn use_program(&mut self, program: Option<NativeProgram>) {
        self.live(|state| {
            if program.is_some_and(|p| !state.programs.get(&p).is_some_and(|o| o.linked)) {
                state.error(ApiError::InvalidOperation);
                return;
            }
            state.current_program = program;
            state.record(GlCall::UseProgram(program));
        })
    }

    fn get_uniform_location(&self, program: NativeProgram, name: &str) -> Option<UniformLocation> {
        let state = self.state();
        let object = state.programs.get(&program).filter(|p| p.linked)?;
        let index = object.uniforms.iter().position(|u| u == name)?;
        Some(UniformLocation(index as i32))
    }

    fn get_attrib_location(&self, program: NativeProgram, name: &str) -> Option<u32> {
        let state = self.state();
        let object = state.programs.get(&program).filter(|p| p.linked)?;
        object
            .attributes
            .iter()
            .position(|a| a == name)
            .map(|slot| slot as u32)
    }

    fn uniform(&mut self, location: UniformLocation, value: &UniformValue) {
        self.live(|state| {
            if state.current_program.is_none() {
                state.error(ApiError::InvalidOperation);
                return;
            }
            state.record(GlCall::Uniform(location, value.clone()));
        })
    }

    // --- Fixed-function state ---

    fn enable(&mut self, capability: Capability) {
        self.live(|state| state.record(GlCall::Enable(capability)))
    }

    fn disable(&mut self, capability: Capability) {
        self.live(|state| state.record(GlCall::Disable(capability)))
    }

    fn viewport(&mut self, viewport: Viewport) {
        self.live(|state| state.record(GlCall::Viewport(viewport)))
    }

    fn scissor(&mut self, rect: Viewport) {
        self.live(|state| state.record(GlCall::Scissor(rect)))
    }

    fn color_mask(&mut self, mask: ColorMask) {
        self.live(|state| state.record(GlCall::ColorMask(mask)))
    }

    fn clear_color(&mut self, color: Color) {
        self.live(|state| state.record(GlCall::ClearColor(color)))
    }

    fn clear_depth(&mut self, depth: f32) {
        self.live(|state| state.record(GlCall::ClearDepth(depth)))
    }

    fn clear_stencil(&mut self, value: i32) {
        self.live(|state| state.record(GlCall::ClearStencil(value)))
    }

    fn clear(&mut self, mask: ClearMask) {
        self.live(|state| state.record(GlCall::Clear(mask)))
    }

    fn depth_mask(&mut self, write: bool) {
        self.live(|state| state.record(GlCall::DepthMask(write)))
    }

    fn depth_func(&mut self, func: CompareFunction) {
        self.live(|state| state.record(GlCall::DepthFunc(func)))
    }

    fn cull_face(&mut self, face: Face) {
        self.live(|state| state.record(GlCall::CullFace(face)))
    }

    fn front_face(&mut self, winding: FrontFace) {
        self.live(|state| state.record(GlCall::FrontFace(winding)))
    }

    fn polygon_offset(&mut self, factor: f32, units: f32) {
        self.live(|state| state.record(GlCall::PolygonOffset(factor, units)))
    }

    fn stencil_func(&mut self, func: CompareFunction, reference: i32, mask: u32) {
        self.live(|state| {
            state.record(GlCall::StencilFunc {
                func,
                reference,
                mask,
            })
        })
    }

    fn stencil_op(&mut self, fail: StencilOp, depth_fail: StencilOp, pass: StencilOp) {
        self.live(|state| {
            state.record(GlCall::StencilOp {
                fail,
                depth_fail,
                pass,
            })
        })
    }

    fn stencil_mask(&mut self, mask: u32) {
        self.live(|state| state.record(GlCall::StencilMask(mask)))
    }

    fn blend_func_separate(&mut self, func: BlendFunc) {
        self.live(|state| state.record(GlCall::BlendFuncSeparate(func)))
    }

    fn blend_equation(&mut self, equation: BlendEquation) {
        self.live(|state| state.record(GlCall::BlendEquation(equation)))
    }

    fn blend_color(&mut self, color: Color) {
        self.live(|state| state.record(GlCall::BlendColor(color)))
    }

    // --- Draws ---

    fn draw_elements(
        &mut self,
        topology: PrimitiveTopology,
        count: u32,
        format: IndexFormat,
        byte_offset: usize,
    ) {
        self.live(|state| {
            if Self::bound_buffer_in(state, BufferTarget::ElementArray).is_none() {
                state.error(ApiError::InvalidOperation);
                return;
            }
            state.record(GlCall::DrawElements {
                topology,
                count,
                format,
                offset: byte_offset,
            });
        })
    }

    fn draw_elements_instanced(
        &mut self,
        topology: PrimitiveTopology,
        count: u32,
        format: IndexFormat,
        byte_offset: usize,
        instances: u32,
    ) {
        let v2 = self.is_v2();
        self.live(|state| {
            if !v2 && !state.aliases.contains(&EntryPointAlias::InstancedArrays) {
                state.error(ApiError::InvalidOperation);
                return;
            }
            if Self::bound_buffer_in(state, BufferTarget::ElementArray).is_none() {
                state.error(ApiError::InvalidOperation);
                return;
            }
            state.record(GlCall::DrawElementsInstanced {
                topology,
                count,
                format,
                offset: byte_offset,
                instances,
            });
        })
    }

    fn draw_arrays(&mut self, topology: PrimitiveTopology, first: u32, count: u32) {
        self.live(|state| {
            state.record(GlCall::DrawArrays {
                topology,
                first,
                count,
            })
        })
    }

    fn draw_arrays_instanced(
        &mut self,
        topology: PrimitiveTopology,
        first: u32,
        count: u32,
        instances: u32,
    ) {
        let v2 = self.is_v2();
        self.live(|state| {
            if !v2 && !state.aliases.contains(&EntryPointAlias::InstancedArrays) {
                state.error(ApiError::InvalidOperation);
                return;
            }
            state.record(GlCall::DrawArraysInstanced {
                topology,
                first,
                count,
                instances,
            });
        })
    }

    fn flush(&mut self) {
        self.live(|state| state.record(GlCall::Flush))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_one_context() {
        let gl = HeadlessGl::new(HeadlessConfig::version_2());
        let mut api = gl.clone();
        let buffer = api.create_buffer().unwrap();
        assert_eq!(gl.live_buffers(), 1);
        assert_eq!(gl.calls(), vec![GlCall::CreateBuffer(buffer)]);
    }

    #[test]
    fn lost_context_refuses_creation_and_ignores_calls() {
        let mut gl = HeadlessGl::new(HeadlessConfig::version_2());
        gl.create_texture().unwrap();
        gl.lose_context();
        assert!(gl.is_context_lost());
        assert_eq!(gl.live_textures(), 0);
        assert!(gl.create_texture().is_none());
        gl.clear_calls();
        gl.clear(ClearMask::COLOR);
        assert_eq!(gl.call_count(), 0);
        assert_eq!(gl.get_error(), ApiError::ContextLost);

        gl.restore_context();
        assert!(!gl.is_context_lost());
        assert!(gl.create_texture().is_some());
    }

    #[test]
    fn restored_handles_never_repeat() {
        let mut gl = HeadlessGl::new(HeadlessConfig::version_2());
        let before = gl.create_buffer().unwrap();
        gl.lose_context();
        gl.restore_context();
        let after = gl.create_buffer().unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn buffer_sub_data_must_fit() {
        let mut gl = HeadlessGl::new(HeadlessConfig::version_2());
        let buffer = gl.create_buffer().unwrap();
        gl.bind_buffer(BufferTarget::Array, Some(buffer));
        gl.buffer_data(BufferTarget::Array, &[0; 4], BufferUsageHint::Dynamic);
        gl.buffer_sub_data(BufferTarget::Array, 2, &[7, 7]);
        assert_eq!(gl.buffer_contents(buffer), Some(vec![0, 0, 7, 7]));

        gl.buffer_sub_data(BufferTarget::Array, 3, &[1, 1]);
        assert_eq!(gl.get_error(), ApiError::InvalidValue);
    }

    #[test]
    fn element_binding_lives_in_the_vertex_array() {
        let mut gl = HeadlessGl::new(HeadlessConfig::version_2());
        let index = gl.create_buffer().unwrap();
        let vao = gl.create_vertex_array().unwrap();
        gl.bind_vertex_array(Some(vao));
        gl.bind_buffer(BufferTarget::ElementArray, Some(index));
        gl.bind_vertex_array(None);
        assert_eq!(gl.bound_buffer(BufferTarget::ElementArray), None);
        gl.bind_vertex_array(Some(vao));
        assert_eq!(gl.bound_buffer(BufferTarget::ElementArray), Some(index));
    }

    #[test]
    fn version_1_needs_aliases_for_instancing() {
        let mut gl = HeadlessGl::new(HeadlessConfig::version_1());
        gl.vertex_attrib_divisor(0, 1);
        assert_eq!(gl.get_error(), ApiError::InvalidOperation);

        assert!(gl.enable_extension(Extension::InstancedArrays));
        assert!(gl.alias_entry_point(EntryPointAlias::InstancedArrays));
        gl.vertex_attrib_divisor(0, 1);
        assert_eq!(gl.get_error(), ApiError::NoError);
        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::VertexAttribDivisor(0, 1))), 1);
    }

    #[test]
    fn shader_reflection_and_compile_errors() {
        let mut gl = HeadlessGl::new(HeadlessConfig::version_2());
        let vs = gl.create_shader(ShaderStage::Vertex).unwrap();
        gl.shader_source(vs, "attribute vec3 position;\nattribute vec2 uv;\nuniform mat4 bones[4];\n");
        gl.compile_shader(vs);
        let fs = gl.create_shader(ShaderStage::Fragment).unwrap();
        gl.shader_source(fs, "uniform sampler2D diffuse;\n");
        gl.compile_shader(fs);
        let program = gl.create_program().unwrap();
        gl.attach_shader(program, vs);
        gl.attach_shader(program, fs);
        gl.link_program(program);

        assert!(gl.program_link_status(program));
        assert_eq!(gl.get_attrib_location(program, "uv"), Some(1));
        assert!(gl.get_uniform_location(program, "bones").is_some());
        assert!(gl.get_uniform_location(program, "diffuse").is_some());
        assert!(gl.get_uniform_location(program, "missing").is_none());

        let broken = gl.create_shader(ShaderStage::Fragment).unwrap();
        gl.shader_source(broken, "void main() {}\n#error nope\n");
        gl.compile_shader(broken);
        assert!(!gl.shader_compile_status(broken));
        assert_eq!(gl.shader_info_log(broken), "ERROR: 0:2: '#error' : nope");
    }

    #[test]
    fn external_upload_follows_config() {
        let mut gl = HeadlessGl::new(HeadlessConfig::version_2().with_direct_external_upload(false));
        let texture = gl.create_texture().unwrap();
        gl.bind_texture(TextureBindTarget::Texture2D, Some(texture));
        let frame = ExternalFrame {
            width: 1,
            height: 1,
            pixels: vec![0; 4],
        };
        gl.tex_image_external(TexImageTarget::Texture2D, &frame);
        assert_eq!(gl.get_error(), ApiError::InvalidOperation);
    }
}
