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

//! The device aggregate.
//!
//! [`GpuDevice`] owns the native context, the state cache, and every
//! manager, and hands them out as disjoint borrows. It adds no behavior of
//! its own beyond sequencing: deduplicating URL loads, routing uniform
//! writes, and running the restore steps in order.

use crate::capability::{self, ProbeOptions};
use crate::context::GpuContext;
use crate::draw::{DrawDispatcher, InstanceAttribute};
use crate::loading::{ErrorCallback, LoadQueue, TextureLoadFuture, TextureLoadOptions, UploadTarget};
use crate::recovery::{ContextState, RecoveryController, RestoreReport, RestoreStep};
use crate::resources::{
    BufferManager, ProgramManager, RawTextureDescriptor, TextureManager,
};
use crate::state::{StateCache, WipeLevel};
use ember_core::math::{Extent2D, Viewport};
use ember_core::renderer::{
    float_bytes, AlphaMode, BufferId, BufferUsageHint, Capabilities, Color, ContextAttributes,
    ContextProvider, CpuImage, CubeFace, DecodedTexture, DeviceError, ExternalFrame, Fetcher,
    FillMode, GraphicsApi, LossResponse, PotMode, ProgramError, ProgramId, ProgramKey,
    RenderTargetOptions, ResourceError, SamplingMode, TextureFormat, TextureId, TextureLoader,
    TextureType, UniformValue, VertexArrayId, VertexSource, WrapMode, ApiVersion,
};
use ember_core::EngineOptions;

/// Device settings derived from [`EngineOptions`].
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceOptions {
    /// Attributes used when acquiring a context.
    pub attributes: ContextAttributes,
    /// Treat a version-2 context as version 1.
    pub force_version_1: bool,
    /// Rounding policy for power-of-two resizing.
    pub pot_mode: PotMode,
    /// Keep CPU copies of resource content for rebuilding.
    pub retain_sources: bool,
    /// React to context loss.
    pub handle_context_lost: bool,
    /// Prefer `highp` in shaders.
    pub use_high_precision_floats: bool,
    /// Ignore light cache wipes between frames.
    pub prevent_cache_wipe_between_frames: bool,
    /// Texture loaded in place of failed textures.
    pub fallback_texture_url: Option<String>,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self::from(&EngineOptions::default())
    }
}

impl From<&EngineOptions> for DeviceOptions {
    fn from(options: &EngineOptions) -> Self {
        Self {
            attributes: ContextAttributes {
                antialias: options.antialias,
                stencil: options.stencil,
                preserve_drawing_buffer: options.preserve_drawing_buffer,
                max_version: if options.disable_webgl2_support {
                    ApiVersion::V1
                } else {
                    ApiVersion::V2
                },
            },
            force_version_1: options.disable_webgl2_support,
            pot_mode: options.pot_mode,
            retain_sources: options.retains_sources(),
            handle_context_lost: !options.do_not_handle_context_lost,
            use_high_precision_floats: options.use_high_precision_floats,
            prevent_cache_wipe_between_frames: options.prevent_cache_wipe_between_frames,
            fallback_texture_url: options.fallback_texture_url.clone(),
        }
    }
}

/// Feeds decoded loads into the texture manager.
struct TextureUploader<'a, 'b> {
    textures: &'a mut TextureManager,
    ctx: GpuContext<'b>,
}

impl UploadTarget for TextureUploader<'_, '_> {
    fn upload(&mut self, texture: TextureId, decoded: DecodedTexture) -> Result<(), ResourceError> {
        self.textures.upload_decoded(&mut self.ctx, texture, decoded)
    }

    fn mark_failed(&mut self, texture: TextureId) {
        self.textures.mark_failed(texture);
    }

    fn is_alive(&self, texture: TextureId) -> bool {
        self.textures.get(texture).is_some()
    }
}

macro_rules! gpu_ctx {
    ($device:ident) => {
        GpuContext::new(&mut *$device.api, &mut $device.cache, &$device.caps)
    };
}

/// The GPU device: context, state mirror, resources, loads and draws.
#[derive(Debug)]
pub struct GpuDevice {
    api: Box<dyn GraphicsApi>,
    provider: Option<Box<dyn ContextProvider>>,
    caps: Capabilities,
    cache: StateCache,
    buffers: BufferManager,
    textures: TextureManager,
    programs: ProgramManager,
    loads: LoadQueue,
    draw: DrawDispatcher,
    recovery: RecoveryController,
    options: DeviceOptions,
}

impl GpuDevice {
    /// Acquires a context from `provider`. The provider is kept so a fresh
    /// context can be acquired after a loss.
    pub fn from_provider(
        mut provider: Box<dyn ContextProvider>,
        options: DeviceOptions,
    ) -> Result<Self, DeviceError> {
        let api = provider.acquire(&options.attributes).ok_or_else(|| {
            DeviceError::InitializationFailed("the surface returned no graphics context".into())
        })?;
        Ok(Self::build(api, Some(provider), options))
    }

    /// Wraps an existing context. Restores wait for that same context to
    /// come back.
    pub fn from_context(api: Box<dyn GraphicsApi>, options: DeviceOptions) -> Self {
        Self::build(api, None, options)
    }

    fn build(
        mut api: Box<dyn GraphicsApi>,
        provider: Option<Box<dyn ContextProvider>>,
        options: DeviceOptions,
    ) -> Self {
        let caps = capability::probe(
            api.as_mut(),
            ProbeOptions {
                force_version_1: options.force_version_1,
            },
        );
        let mut loads = LoadQueue::new();
        loads.set_fallback_url(options.fallback_texture_url.clone());
        Self {
            api,
            provider,
            caps,
            cache: StateCache::new(),
            buffers: BufferManager::new(),
            textures: TextureManager::new(options.pot_mode, options.retain_sources),
            programs: ProgramManager::new(options.use_high_precision_floats),
            loads,
            draw: DrawDispatcher::new(),
            recovery: RecoveryController::new(options.handle_context_lost),
            options,
        }
    }

    // --- Accessors ---

    /// What the context supports.
    pub fn caps(&self) -> &Capabilities {
        &self.caps
    }

    /// The options the device was built with.
    pub fn options(&self) -> &DeviceOptions {
        &self.options
    }

    /// The bound-state mirror.
    pub fn cache(&self) -> &StateCache {
        &self.cache
    }

    /// Mutable access to the render-state objects.
    pub fn cache_mut(&mut self) -> &mut StateCache {
        &mut self.cache
    }

    /// Buffers.
    pub fn buffers(&self) -> &BufferManager {
        &self.buffers
    }

    /// Textures and render targets.
    pub fn textures(&self) -> &TextureManager {
        &self.textures
    }

    /// Programs.
    pub fn programs(&self) -> &ProgramManager {
        &self.programs
    }

    /// Programs, for subscribing to compile events.
    pub fn programs_mut(&mut self) -> &mut ProgramManager {
        &mut self.programs
    }

    /// The load queue.
    pub fn loads(&self) -> &LoadQueue {
        &self.loads
    }

    /// The draw dispatcher.
    pub fn draw(&self) -> &DrawDispatcher {
        &self.draw
    }

    /// The recovery lifecycle.
    pub fn recovery(&self) -> &RecoveryController {
        &self.recovery
    }

    /// Returns `true` while the context is lost or being restored.
    pub fn is_context_lost(&self) -> bool {
        self.recovery.is_lost() || self.api.is_context_lost()
    }

    /// Draw calls issued since creation.
    pub fn draw_calls(&self) -> u64 {
        self.draw.draw_calls()
    }

    /// The surface size, when the device was built from a surface.
    pub fn surface_size(&self) -> Option<Extent2D> {
        self.provider.as_ref().map(|p| p.surface_size())
    }

    /// The surface, when the device was built from one.
    pub fn provider_mut(&mut self) -> Option<&mut (dyn ContextProvider + 'static)> {
        self.provider.as_deref_mut()
    }

    // --- Buffers ---

    /// Creates a static vertex buffer from floats.
    pub fn create_vertex_buffer(&mut self, data: &[f32]) -> Result<BufferId, ResourceError> {
        self.create_vertex_buffer_bytes(float_bytes(data), BufferUsageHint::Static)
    }

    /// Creates a vertex buffer from raw bytes.
    pub fn create_vertex_buffer_bytes(
        &mut self,
        data: &[u8],
        usage: BufferUsageHint,
    ) -> Result<BufferId, ResourceError> {
        let keep = self.options.retain_sources;
        self.buffers
            .create_vertex_buffer(&mut gpu_ctx!(self), data, usage, keep)
    }

    /// Creates a dynamic vertex buffer from floats.
    pub fn create_dynamic_vertex_buffer(&mut self, data: &[f32]) -> Result<BufferId, ResourceError> {
        let keep = self.options.retain_sources;
        self.buffers
            .create_dynamic_vertex_buffer(&mut gpu_ctx!(self), float_bytes(data), keep)
    }

    /// Creates an instance buffer of `capacity` bytes.
    pub fn create_instance_buffer(&mut self, capacity: usize) -> Result<BufferId, ResourceError> {
        self.buffers
            .create_instance_buffer(&mut gpu_ctx!(self), capacity)
    }

    /// Creates an index buffer.
    pub fn create_index_buffer(
        &mut self,
        indices: &[u32],
        updatable: bool,
    ) -> Result<BufferId, ResourceError> {
        let keep = self.options.retain_sources;
        self.buffers
            .create_index_buffer(&mut gpu_ctx!(self), indices, updatable, keep)
    }

    /// Writes floats into a vertex buffer.
    pub fn update_dynamic_vertex_buffer(
        &mut self,
        id: BufferId,
        data: &[f32],
        byte_offset: Option<usize>,
        byte_length: Option<usize>,
    ) -> Result<(), ResourceError> {
        self.buffers.update_dynamic_vertex_buffer(
            &mut gpu_ctx!(self),
            id,
            float_bytes(data),
            byte_offset,
            byte_length,
        )
    }

    /// Replaces indices starting at `index_offset`.
    pub fn update_dynamic_index_buffer(
        &mut self,
        id: BufferId,
        indices: &[u32],
        index_offset: Option<usize>,
    ) -> Result<(), ResourceError> {
        self.buffers
            .update_dynamic_index_buffer(&mut gpu_ctx!(self), id, indices, index_offset)
    }

    /// Adds an owner to a buffer.
    pub fn retain_buffer(&mut self, id: BufferId) -> Result<u32, ResourceError> {
        self.buffers.retain(id)
    }

    /// Removes an owner from a buffer.
    pub fn release_buffer(&mut self, id: BufferId) -> Result<bool, ResourceError> {
        self.buffers.release(&mut gpu_ctx!(self), id)
    }

    // --- Programs ---

    /// Returns the program for `key`, compiling it on a cache miss.
    pub fn create_program(
        &mut self,
        key: ProgramKey,
        attributes: &[&str],
        uniforms: &[&str],
    ) -> Result<ProgramId, ProgramError> {
        self.programs
            .create_program(&mut gpu_ctx!(self), key, attributes, uniforms)
    }

    /// Removes an owner from a program.
    pub fn release_program(&mut self, id: ProgramId) -> Result<bool, ResourceError> {
        self.programs.release(&mut gpu_ctx!(self), id)
    }

    /// Makes a program current.
    pub fn enable_program(&mut self, id: ProgramId) {
        let native = self.programs.get(id).and_then(|p| p.native());
        if native.is_none() {
            log::debug!("enable_program: program {id:?} is not ready");
            return;
        }
        self.cache.use_program(&mut *self.api, native, false);
    }

    /// Writes a uniform of `program`. Returns `false` when the program or the
    /// uniform does not exist, or the context is lost.
    pub fn set_uniform(&mut self, program: ProgramId, name: &str, value: UniformValue) -> bool {
        if self.is_context_lost() {
            return false;
        }
        let Some((native, location)) = self.programs.uniform(program, name) else {
            log::debug!("Uniform '{name}' not found in program {program:?}");
            return false;
        };
        self.cache.use_program(&mut *self.api, Some(native), false);
        self.api.uniform(location, &value);
        true
    }

    /// Sets an `int` uniform.
    pub fn set_int(&mut self, program: ProgramId, name: &str, value: i32) -> bool {
        self.set_uniform(program, name, UniformValue::Int(value))
    }

    /// Sets a `float` uniform.
    pub fn set_float(&mut self, program: ProgramId, name: &str, value: f32) -> bool {
        self.set_uniform(program, name, UniformValue::Float(value))
    }

    /// Sets a `vec2` uniform.
    pub fn set_float2(&mut self, program: ProgramId, name: &str, x: f32, y: f32) -> bool {
        self.set_uniform(program, name, UniformValue::Float2([x, y]))
    }

    /// Sets a `vec3` uniform.
    pub fn set_float3(&mut self, program: ProgramId, name: &str, x: f32, y: f32, z: f32) -> bool {
        self.set_uniform(program, name, UniformValue::Float3([x, y, z]))
    }

    /// Sets a `vec4` uniform.
    pub fn set_float4(&mut self, program: ProgramId, name: &str, value: [f32; 4]) -> bool {
        self.set_uniform(program, name, UniformValue::Float4(value))
    }

    /// Sets a column-major `mat4` uniform.
    pub fn set_matrix4(&mut self, program: ProgramId, name: &str, value: [f32; 16]) -> bool {
        self.set_uniform(program, name, UniformValue::Matrix4(value))
    }

    /// Sets an `int[]` uniform.
    pub fn set_int_array(&mut self, program: ProgramId, name: &str, values: &[i32]) -> bool {
        self.set_uniform(program, name, UniformValue::IntArray(values.to_vec()))
    }

    /// Sets a `float[]` uniform.
    pub fn set_float_array(&mut self, program: ProgramId, name: &str, values: &[f32]) -> bool {
        self.set_uniform(program, name, UniformValue::FloatArray(values.to_vec()))
    }

    /// Binds `texture` to sampler unit `channel` and points the sampler
    /// uniform at it. Textures that are not ready bind the empty texture.
    pub fn set_texture(
        &mut self,
        program: ProgramId,
        channel: u32,
        uniform: &str,
        texture: TextureId,
    ) -> bool {
        if self.is_context_lost() {
            return false;
        }
        if channel >= self.caps.max_texture_units.max(1) {
            log::debug!("Texture channel {channel} exceeds the unit count");
            return false;
        }
        if !self.set_int(program, uniform, channel as i32) {
            return false;
        }
        self.textures
            .bind_to_unit(&mut gpu_ctx!(self), channel, texture);
        true
    }

    // --- Textures ---

    /// Creates a texture loaded from `url` (or a `data:` URI).
    ///
    /// A texture already created from the same URL with the same options is
    /// retained and returned instead of loading again.
    pub fn create_texture_from_url(
        &mut self,
        url: &str,
        options: TextureLoadOptions,
        on_error: Option<ErrorCallback>,
    ) -> Result<(TextureId, TextureLoadFuture), ResourceError> {
        let key = options.cache_key(url);
        if let Some(id) = self.textures.find_by_key(&key) {
            self.textures.retain_texture(id)?;
            log::trace!("Reusing texture {id:?} for '{url}'");
            let future = match self.loads.subscribe(id) {
                Some(future) => future,
                None => TextureLoadFuture::resolved(Ok(id)),
            };
            return Ok((id, future));
        }
        let id = self
            .textures
            .create_url_texture(&mut gpu_ctx!(self), url, &options)?;
        let future = self.loads.request(id, url, options, on_error, &self.caps);
        Ok((id, future))
    }

    /// Creates a texture decoded from in-memory bytes. `name` stands in for
    /// the URL; buffers are never deduplicated.
    pub fn create_texture_from_buffer(
        &mut self,
        name: &str,
        data: Vec<u8>,
        options: TextureLoadOptions,
        on_error: Option<ErrorCallback>,
    ) -> Result<(TextureId, TextureLoadFuture), ResourceError> {
        let id = self
            .textures
            .create_buffer_texture(&mut gpu_ctx!(self), name, &options)?;
        let future = self
            .loads
            .request_from_buffer(id, name, data, options, on_error, &self.caps);
        Ok((id, future))
    }

    /// Creates a texture from raw bytes.
    pub fn create_raw_texture(
        &mut self,
        data: Option<&[u8]>,
        descriptor: RawTextureDescriptor,
    ) -> Result<TextureId, ResourceError> {
        self.textures
            .create_raw_texture(&mut gpu_ctx!(self), data, descriptor)
    }

    /// Replaces the content of a raw texture.
    pub fn update_raw_texture(
        &mut self,
        id: TextureId,
        data: Option<&[u8]>,
        format: TextureFormat,
        ty: TextureType,
    ) -> Result<(), ResourceError> {
        self.textures
            .update_raw_texture(&mut gpu_ctx!(self), id, data, format, ty)
    }

    /// Creates a texture refreshed by the caller.
    pub fn create_dynamic_texture(
        &mut self,
        width: u32,
        height: u32,
        generate_mipmaps: bool,
        sampling_mode: SamplingMode,
    ) -> Result<TextureId, ResourceError> {
        self.textures.create_dynamic_texture(
            &mut gpu_ctx!(self),
            width,
            height,
            generate_mipmaps,
            sampling_mode,
        )
    }

    /// Uploads a new frame of a dynamic texture.
    pub fn update_dynamic_texture(
        &mut self,
        id: TextureId,
        image: &CpuImage,
        invert_y: bool,
        premultiply_alpha: bool,
    ) -> Result<(), ResourceError> {
        self.textures.update_dynamic_texture(
            &mut gpu_ctx!(self),
            id,
            image,
            invert_y,
            premultiply_alpha,
        )
    }

    /// Creates a texture fed by a video source.
    pub fn create_video_texture(
        &mut self,
        width: u32,
        height: u32,
        generate_mipmaps: bool,
        sampling_mode: SamplingMode,
    ) -> Result<TextureId, ResourceError> {
        self.textures.create_video_texture(
            &mut gpu_ctx!(self),
            width,
            height,
            generate_mipmaps,
            sampling_mode,
        )
    }

    /// Uploads a video frame.
    pub fn update_video_texture(
        &mut self,
        id: TextureId,
        frame: &ExternalFrame,
        invert_y: bool,
    ) -> Result<(), ResourceError> {
        self.textures
            .update_video_texture(&mut gpu_ctx!(self), id, frame, invert_y)
    }

    /// Changes the sampling mode of a texture.
    pub fn update_texture_sampling_mode(
        &mut self,
        id: TextureId,
        mode: SamplingMode,
    ) -> Result<(), ResourceError> {
        self.textures
            .update_texture_sampling_mode(&mut gpu_ctx!(self), id, mode)
    }

    /// Changes the wrap modes of a texture.
    pub fn update_texture_wrapping(
        &mut self,
        id: TextureId,
        wrap_u: Option<WrapMode>,
        wrap_v: Option<WrapMode>,
        wrap_r: Option<WrapMode>,
    ) -> Result<(), ResourceError> {
        self.textures
            .update_texture_wrapping(&mut gpu_ctx!(self), id, wrap_u, wrap_v, wrap_r)
    }

    /// Sets the anisotropic filtering level of a texture.
    pub fn update_texture_anisotropy(&mut self, id: TextureId, level: f32) -> Result<(), ResourceError> {
        self.textures
            .update_texture_anisotropy(&mut gpu_ctx!(self), id, level)
    }

    /// Regenerates the mip chain of a texture.
    pub fn generate_mipmaps(&mut self, id: TextureId) -> Result<(), ResourceError> {
        self.textures.generate_mipmaps(&mut gpu_ctx!(self), id)
    }

    /// Adds an owner to a texture.
    pub fn retain_texture(&mut self, id: TextureId) -> Result<u32, ResourceError> {
        self.textures.retain_texture(id)
    }

    /// Removes an owner from a texture. A load still in flight for a deleted
    /// texture is aborted.
    pub fn release_texture(&mut self, id: TextureId) -> Result<bool, ResourceError> {
        let deleted = self.textures.release_texture(&mut gpu_ctx!(self), id)?;
        if deleted {
            self.loads.abort_texture(id);
        }
        Ok(deleted)
    }

    /// The built-in 1x1 empty texture.
    pub fn empty_texture(&mut self) -> Result<TextureId, ResourceError> {
        self.textures.empty_texture(&mut gpu_ctx!(self))
    }

    /// The built-in 1x1 empty cube texture.
    pub fn empty_cube_texture(&mut self) -> Result<TextureId, ResourceError> {
        self.textures.empty_cube_texture(&mut gpu_ctx!(self))
    }

    /// Deletes the built-in empty textures.
    pub fn release_empty_textures(&mut self) {
        self.textures.release_empty_textures(&mut gpu_ctx!(self));
    }

    // --- Render targets ---

    /// Creates a render target.
    pub fn create_render_target_texture(
        &mut self,
        size: Extent2D,
        options: RenderTargetOptions,
    ) -> Result<TextureId, ResourceError> {
        self.textures
            .create_render_target_texture(&mut gpu_ctx!(self), size, options)
    }

    /// Changes the MSAA sample count of a render target. Returns the count
    /// actually used.
    pub fn update_render_target_samples(&mut self, id: TextureId, samples: u32) -> Result<u32, ResourceError> {
        self.textures
            .update_render_target_samples(&mut gpu_ctx!(self), id, samples)
    }

    /// Creates a depth (and optionally stencil) texture.
    pub fn create_depth_stencil_texture(
        &mut self,
        size: Extent2D,
        with_stencil: bool,
    ) -> Result<TextureId, ResourceError> {
        self.textures
            .create_depth_stencil_texture(&mut gpu_ctx!(self), size, with_stencil)
    }

    /// Attaches (or with `None` detaches) a depth texture to a render target.
    pub fn set_depth_stencil_texture(
        &mut self,
        render_target: TextureId,
        depth: Option<TextureId>,
    ) -> Result<(), ResourceError> {
        self.textures
            .set_depth_stencil_texture(&mut gpu_ctx!(self), render_target, depth)
    }

    /// Renders into a render target.
    pub fn bind_framebuffer(&mut self, id: TextureId, face: Option<CubeFace>) -> Result<(), ResourceError> {
        self.textures.bind_framebuffer(&mut gpu_ctx!(self), id, face)
    }

    /// Finishes rendering into a render target: resolves MSAA and builds mips.
    pub fn unbind_framebuffer(&mut self, id: TextureId, skip_mipmaps: bool) -> Result<(), ResourceError> {
        self.textures
            .unbind_framebuffer(&mut gpu_ctx!(self), id, skip_mipmaps)
    }

    /// Returns to the default framebuffer sized to `surface`.
    pub fn restore_default_framebuffer(&mut self, surface: Extent2D) {
        self.textures
            .restore_default_framebuffer(&mut gpu_ctx!(self), surface);
    }

    // --- Loading ---

    /// Appends a loader plugin.
    pub fn register_loader(&mut self, loader: Box<dyn TextureLoader>) {
        self.loads.register_loader(loader);
    }

    /// Sets the decoder used when no plugin claims a payload.
    pub fn set_default_loader(&mut self, loader: Box<dyn TextureLoader>) {
        self.loads.set_default_loader(loader);
    }

    /// Sets the fetcher for URLs.
    pub fn set_fetcher(&mut self, fetcher: Box<dyn Fetcher>) {
        self.loads.set_fetcher(fetcher);
    }

    /// Changes the process-wide fallback texture.
    pub fn set_fallback_texture_url(&mut self, url: Option<String>) {
        self.options.fallback_texture_url = url.clone();
        self.loads.set_fallback_url(url);
    }

    /// Drains load completions into textures. Completions wait while the
    /// context is lost.
    pub fn poll_loads(&mut self) -> usize {
        if self.is_context_lost() {
            return 0;
        }
        let mut uploader = TextureUploader {
            textures: &mut self.textures,
            ctx: GpuContext::new(&mut *self.api, &mut self.cache, &self.caps),
        };
        self.loads.poll(&self.caps, &mut uploader)
    }

    /// Aborts every load in flight.
    pub fn abort_loads(&mut self) {
        self.loads.abort_all();
    }

    // --- Draws ---

    /// Binds vertex sources, an index buffer and a program.
    pub fn bind_buffers(&mut self, sources: &[VertexSource], index: Option<BufferId>, program: ProgramId) {
        self.draw.bind_buffers(
            &mut gpu_ctx!(self),
            &self.buffers,
            &self.programs,
            sources,
            index,
            program,
        );
    }

    /// Draws from the bound index buffer.
    pub fn draw_indexed(
        &mut self,
        fill_mode: FillMode,
        index_start: u32,
        index_count: u32,
        instances: Option<u32>,
    ) -> bool {
        if self.recovery.is_lost() {
            return false;
        }
        self.draw
            .draw_indexed(&mut gpu_ctx!(self), fill_mode, index_start, index_count, instances)
    }

    /// Draws non-indexed vertices.
    pub fn draw_arrays(
        &mut self,
        fill_mode: FillMode,
        vertex_start: u32,
        vertex_count: u32,
        instances: Option<u32>,
    ) -> bool {
        if self.recovery.is_lost() {
            return false;
        }
        self.draw
            .draw_arrays(&mut gpu_ctx!(self), fill_mode, vertex_start, vertex_count, instances)
    }

    /// Uploads per-instance data and binds it.
    pub fn update_and_bind_instances_buffer(
        &mut self,
        buffer: BufferId,
        data: &[f32],
        attributes: &[InstanceAttribute],
    ) -> Result<(), ResourceError> {
        self.draw.update_and_bind_instances_buffer(
            &mut gpu_ctx!(self),
            &mut self.buffers,
            buffer,
            data,
            attributes,
        )
    }

    /// Resets instance attribute divisors.
    pub fn unbind_instance_attributes(&mut self) {
        self.draw.unbind_instance_attributes(&mut gpu_ctx!(self));
    }

    /// Records a vertex array object.
    pub fn record_vertex_array(
        &mut self,
        sources: &[VertexSource],
        index: Option<BufferId>,
        program: ProgramId,
    ) -> Result<VertexArrayId, ResourceError> {
        self.draw.record_vertex_array(
            &mut gpu_ctx!(self),
            &self.buffers,
            &self.programs,
            sources,
            index,
            program,
        )
    }

    /// Binds a recorded vertex array.
    pub fn bind_vertex_array(&mut self, id: VertexArrayId) {
        self.draw.bind_vertex_array(&mut gpu_ctx!(self), id);
    }

    /// Deletes a recorded vertex array.
    pub fn release_vertex_array(&mut self, id: VertexArrayId) {
        self.draw.release_vertex_array(&mut gpu_ctx!(self), id);
    }

    /// Clears the bound framebuffer.
    pub fn clear(&mut self, color: Option<Color>, back_buffer: bool, depth: bool, stencil: bool) {
        self.draw
            .clear(&mut gpu_ctx!(self), color, back_buffer, depth, stencil);
    }

    /// Sets the viewport.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.draw.set_viewport(&mut gpu_ctx!(self), viewport);
    }

    /// Sets or lifts the scissor rectangle.
    pub fn set_scissor(&mut self, rect: Option<Viewport>) {
        self.draw.set_scissor(&mut gpu_ctx!(self), rect);
    }

    /// Applies an alpha blending preset.
    pub fn set_alpha_mode(&mut self, mode: AlphaMode) {
        self.cache.alpha.set_alpha_mode(mode);
    }

    /// Forwards pending depth, stencil and blend state.
    pub fn apply_states(&mut self) {
        self.cache.apply_states(&mut *self.api);
    }

    // --- Cache invalidation ---

    /// Forgets cached state. A light wipe requested between frames is
    /// ignored when the device was told to keep its cache.
    pub fn wipe_caches(&mut self, level: WipeLevel, between_frames: bool) {
        if level == WipeLevel::Light
            && between_frames
            && self.options.prevent_cache_wipe_between_frames
        {
            return;
        }
        self.cache.wipe(level);
        self.draw.reset_binding();
    }

    // --- Frames ---

    /// Start of a frame: drains load completions.
    pub fn begin_frame(&mut self) -> usize {
        self.poll_loads()
    }

    /// End of a frame: flushes when forced or when the platform needs it.
    pub fn end_frame(&mut self, flush: Option<bool>) {
        if self.is_context_lost() {
            return;
        }
        if flush.unwrap_or(self.caps.needs_end_frame_flush) {
            self.api.flush();
        }
    }

    // --- Context loss ---

    /// Handles a context-loss signal. Returns the response for the host, or
    /// `None` when loss handling is disabled.
    pub fn handle_context_lost(&mut self) -> Option<LossResponse> {
        let was_lost = self.recovery.is_lost();
        let response = self.recovery.on_context_lost()?;
        if !was_lost {
            self.cache.wipe(WipeLevel::Full);
            self.programs.mark_context_lost();
            self.textures.mark_context_lost();
            self.buffers.mark_context_lost();
            self.draw.mark_context_lost();
        }
        Some(response)
    }

    /// Rebuilds everything after a loss, in order: context, capabilities,
    /// programs, textures, buffers and vertex arrays, then a full cache wipe.
    ///
    /// Failing to get a live context leaves the device lost. Resources that
    /// cannot be rebuilt are counted in the report and stay not ready.
    pub fn restore_context(&mut self) -> Result<RestoreReport, DeviceError> {
        if !self.recovery.begin_restore() {
            return Err(DeviceError::RestoreFailed(match self.recovery.state() {
                ContextState::Active => "the context is not lost".into(),
                _ => "context loss handling is disabled".into(),
            }));
        }
        let result = self.run_restore();
        self.recovery.finish_restore(&result);
        result
    }

    fn run_restore(&mut self) -> Result<RestoreReport, DeviceError> {
        let mut report = RestoreReport::default();

        if let Some(provider) = self.provider.as_mut() {
            let api = provider.acquire(&self.options.attributes).ok_or_else(|| {
                DeviceError::RestoreFailed("the surface returned no graphics context".into())
            })?;
            self.api = api;
        }
        self.ensure_live()?;
        report.step(RestoreStep::AcquireContext);

        self.caps = capability::probe(
            &mut *self.api,
            ProbeOptions {
                force_version_1: self.options.force_version_1,
            },
        );
        report.step(RestoreStep::ProbeCapabilities);

        report.programs = self.programs.rebuild_all(&mut gpu_ctx!(self));
        self.ensure_live()?;
        report.step(RestoreStep::Programs);

        report.textures = self.textures.rebuild_all(&mut gpu_ctx!(self));
        self.ensure_live()?;
        report.step(RestoreStep::Textures);

        report.buffers = self.buffers.rebuild_all(&mut gpu_ctx!(self));
        report.vertex_arrays =
            self.draw
                .rebuild_vertex_arrays(&mut gpu_ctx!(self), &self.buffers, &self.programs);
        self.ensure_live()?;
        report.step(RestoreStep::Buffers);

        self.cache.wipe(WipeLevel::Full);
        self.draw.reset_binding();
        report.step(RestoreStep::WipeCaches);
        Ok(report)
    }

    fn ensure_live(&self) -> Result<(), DeviceError> {
        if self.api.is_context_lost() {
            Err(DeviceError::RestoreFailed("the context is still lost".into()))
        } else {
            Ok(())
        }
    }

    // --- Disposal ---

    /// Deletes every compiled program.
    pub fn dispose_programs(&mut self) {
        self.programs.dispose_all(&mut gpu_ctx!(self));
    }

    /// Aborts loads and deletes every remaining GPU object.
    pub fn dispose(&mut self) {
        self.loads.abort_all();
        self.release_empty_textures();
        let mut ctx = GpuContext::new(&mut *self.api, &mut self.cache, &self.caps);
        self.draw.dispose_all(&mut ctx);
        self.programs.dispose_all(&mut ctx);
        self.textures.dispose_all(&mut ctx);
        self.buffers.dispose_all(&mut ctx);
        log::debug!("GPU device disposed");
    }
}
