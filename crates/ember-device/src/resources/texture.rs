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

//! Internal textures, render targets, and their upload paths.

use super::pot::{self, power_of_two_size};
use super::rescale::GpuRescaler;
use super::RebuildReport;
use crate::context::GpuContext;
use crate::loading::TextureLoadOptions;
use ember_core::math::{Extent2D, Viewport};
use ember_core::renderer::{
    image_byte_size, Attachment, BlitFilter, ClearMask, CpuImage, CubeFace, DecodedTexture,
    ExternalFrame, FramebufferTarget, NativeFramebuffer, NativeRenderbuffer, NativeTexture,
    PixelStore, PotMode, RenderTargetOptions, RenderbufferFormat, ResourceError, ResourceKind,
    SamplingMode, TexImageTarget, TexParameter, TextureBindTarget, TextureFormat, TextureId,
    TextureSource, TextureType, WrapMode,
};
use std::collections::HashMap;

/// Texture unit used for uploads.
const UPLOAD_UNIT: u32 = 0;

/// Whether a texture can be sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureReadiness {
    /// Storage exists but no content has landed yet.
    Pending,
    /// Content is uploaded.
    Ready,
    /// Loading failed for good.
    Failed,
}

/// Framebuffer objects owned by a render target.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTargetParts {
    framebuffer: Option<NativeFramebuffer>,
    depth_stencil_buffer: Option<NativeRenderbuffer>,
    msaa_framebuffer: Option<NativeFramebuffer>,
    msaa_color_buffer: Option<NativeRenderbuffer>,
    samples: u32,
    options: RenderTargetOptions,
    depth_stencil_texture: Option<TextureId>,
}

impl RenderTargetParts {
    /// The framebuffer the color texture is attached to.
    pub fn framebuffer(&self) -> Option<NativeFramebuffer> {
        self.framebuffer
    }

    /// The depth/stencil renderbuffer, if one was requested.
    pub fn depth_stencil_buffer(&self) -> Option<NativeRenderbuffer> {
        self.depth_stencil_buffer
    }

    /// The framebuffer rendered into when multisampled.
    pub fn msaa_framebuffer(&self) -> Option<NativeFramebuffer> {
        self.msaa_framebuffer
    }

    /// The multisampled color renderbuffer.
    pub fn msaa_color_buffer(&self) -> Option<NativeRenderbuffer> {
        self.msaa_color_buffer
    }

    /// Effective sample count.
    pub fn samples(&self) -> u32 {
        self.samples
    }

    /// The options the target was created with.
    pub fn options(&self) -> &RenderTargetOptions {
        &self.options
    }

    /// The depth texture attached in place of the renderbuffer.
    pub fn depth_stencil_texture(&self) -> Option<TextureId> {
        self.depth_stencil_texture
    }
}

/// The engine's native-owning texture record.
#[derive(Debug)]
pub struct InternalTexture {
    native: Option<NativeTexture>,
    width: u32,
    height: u32,
    base_width: u32,
    base_height: u32,
    format: TextureFormat,
    ty: TextureType,
    compressed: bool,
    generate_mipmaps: bool,
    has_mipmaps: bool,
    is_cube: bool,
    sampling: SamplingMode,
    wrap_u: WrapMode,
    wrap_v: WrapMode,
    wrap_r: WrapMode,
    invert_y: bool,
    source: TextureSource,
    original_source: TextureSource,
    readiness: TextureReadiness,
    ref_count: u32,
    url: Option<String>,
    cache_key: Option<String>,
    retained: Option<DecodedTexture>,
    byte_size: usize,
    empty_storage: bool,
    render_target: Option<RenderTargetParts>,
}

impl InternalTexture {
    fn new(source: TextureSource, width: u32, height: u32) -> Self {
        Self {
            native: None,
            width,
            height,
            base_width: width,
            base_height: height,
            format: TextureFormat::Rgba,
            ty: TextureType::UnsignedByte,
            compressed: false,
            generate_mipmaps: false,
            has_mipmaps: false,
            is_cube: false,
            sampling: SamplingMode::Trilinear,
            wrap_u: WrapMode::Repeat,
            wrap_v: WrapMode::Repeat,
            wrap_r: WrapMode::Repeat,
            invert_y: false,
            source,
            original_source: source,
            readiness: TextureReadiness::Pending,
            ref_count: 1,
            url: None,
            cache_key: None,
            retained: None,
            byte_size: 0,
            empty_storage: false,
            render_target: None,
        }
    }

    /// The native texture, `None` after a loss until rebuilt.
    pub fn native(&self) -> Option<NativeTexture> {
        self.native
    }

    /// Storage size.
    pub fn size(&self) -> Extent2D {
        Extent2D::new(self.width, self.height)
    }

    /// The size that was requested, before power-of-two rounding.
    pub fn base_size(&self) -> Extent2D {
        Extent2D::new(self.base_width, self.base_height)
    }

    /// Channel layout.
    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// Component type after capability downgrades.
    pub fn texture_type(&self) -> TextureType {
        self.ty
    }

    /// Returns `true` for block-compressed content.
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Returns `true` if a mip chain is present.
    pub fn has_mipmaps(&self) -> bool {
        self.has_mipmaps
    }

    /// Returns `true` for cube maps.
    pub fn is_cube(&self) -> bool {
        self.is_cube
    }

    /// Current sampling mode.
    pub fn sampling_mode(&self) -> SamplingMode {
        self.sampling
    }

    /// Wrap modes along U, V, and W.
    pub fn wrapping(&self) -> (WrapMode, WrapMode, WrapMode) {
        (self.wrap_u, self.wrap_v, self.wrap_r)
    }

    /// Whether rows are flipped on upload.
    pub fn invert_y(&self) -> bool {
        self.invert_y
    }

    /// Where the content currently comes from.
    pub fn source(&self) -> TextureSource {
        self.source
    }

    /// Readiness state.
    pub fn readiness(&self) -> TextureReadiness {
        self.readiness
    }

    /// Returns `true` when the texture can be sampled.
    pub fn is_ready(&self) -> bool {
        self.readiness == TextureReadiness::Ready && self.native.is_some()
    }

    /// Number of live owners.
    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    /// The URL the content was requested from.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// The deduplication key for URL textures.
    pub fn cache_key(&self) -> Option<&str> {
        self.cache_key.as_deref()
    }

    /// Returns `true` if the content is retained for rebuilding.
    pub fn has_retained_source(&self) -> bool {
        self.retained.is_some()
    }

    /// Bytes of GPU storage accounted to this texture.
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    /// Framebuffer objects, for render targets.
    pub fn render_target(&self) -> Option<&RenderTargetParts> {
        self.render_target.as_ref()
    }

    fn bind_target(&self) -> TextureBindTarget {
        if self.is_cube {
            TextureBindTarget::CubeMap
        } else {
            TextureBindTarget::Texture2D
        }
    }

    fn image_targets(&self) -> Vec<TexImageTarget> {
        if self.is_cube {
            CubeFace::ALL.iter().map(|f| TexImageTarget::CubeFace(*f)).collect()
        } else {
            vec![TexImageTarget::Texture2D]
        }
    }

    fn storage_bytes(&self) -> usize {
        let level0 = image_byte_size(self.width, self.height, self.format, self.ty);
        let faces = if self.is_cube { 6 } else { 1 };
        let chain = if self.has_mipmaps { level0 + level0 / 3 } else { level0 };
        chain * faces
    }
}

/// Descriptor for [`TextureManager::create_raw_texture`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawTextureDescriptor {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Channel layout.
    pub format: TextureFormat,
    /// Requested component type; downgraded when unsupported.
    pub ty: TextureType,
    /// Build a mip chain after upload.
    pub generate_mipmaps: bool,
    /// Flip rows on upload.
    pub invert_y: bool,
    /// Sampling mode.
    pub sampling_mode: SamplingMode,
}

impl RawTextureDescriptor {
    /// An 8-bit RGBA descriptor with bilinear sampling and no mips.
    pub fn rgba8(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: TextureFormat::Rgba,
            ty: TextureType::UnsignedByte,
            generate_mipmaps: false,
            invert_y: false,
            sampling_mode: SamplingMode::Bilinear,
        }
    }
}

/// Creates, uploads, and releases textures and render targets.
#[derive(Debug)]
pub struct TextureManager {
    textures: HashMap<TextureId, InternalTexture>,
    by_key: HashMap<String, TextureId>,
    next_id: usize,
    allocated_bytes: usize,
    pot_mode: PotMode,
    retain_sources: bool,
    rescaler: GpuRescaler,
    empty: Option<TextureId>,
    empty_cube: Option<TextureId>,
    bound_render_target: Option<TextureId>,
}

impl TextureManager {
    /// Creates an empty manager.
    ///
    /// With `retain_sources` decoded content is kept on the CPU so textures
    /// survive a context loss.
    pub fn new(pot_mode: PotMode, retain_sources: bool) -> Self {
        Self {
            textures: HashMap::new(),
            by_key: HashMap::new(),
            next_id: 0,
            allocated_bytes: 0,
            pot_mode,
            retain_sources,
            rescaler: GpuRescaler::new(),
            empty: None,
            empty_cube: None,
            bound_render_target: None,
        }
    }

    /// Looks up a texture.
    pub fn get(&self, id: TextureId) -> Option<&InternalTexture> {
        self.textures.get(&id)
    }

    /// The native texture behind `id`, if any.
    pub fn native(&self, id: TextureId) -> Option<NativeTexture> {
        self.textures.get(&id).and_then(|t| t.native)
    }

    /// The live texture registered under a URL cache key.
    pub fn find_by_key(&self, key: &str) -> Option<TextureId> {
        self.by_key.get(key).copied()
    }

    /// Number of live textures, built-in ones included.
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    /// Returns `true` if no texture is live.
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Total bytes of texture storage.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes
    }

    /// The render target currently bound for drawing.
    pub fn bound_render_target(&self) -> Option<TextureId> {
        self.bound_render_target
    }

    fn missing(&self, id: TextureId) -> ResourceError {
        if id.0 < self.next_id {
            ResourceError::Released {
                kind: ResourceKind::Texture,
                id: id.0,
            }
        } else {
            ResourceError::InvalidHandle {
                kind: ResourceKind::Texture,
                id: id.0,
            }
        }
    }

    fn texture_mut(&mut self, id: TextureId) -> Result<&mut InternalTexture, ResourceError> {
        let missing = self.missing(id);
        self.textures.get_mut(&id).ok_or(missing)
    }

    fn insert(&mut self, texture: InternalTexture) -> TextureId {
        let id = TextureId(self.next_id);
        self.next_id += 1;
        self.allocated_bytes += texture.byte_size;
        if let Some(key) = &texture.cache_key {
            self.by_key.insert(key.clone(), id);
        }
        log::trace!(
            "Created {:?} texture {id:?} ({}x{})",
            texture.source,
            texture.width,
            texture.height
        );
        self.textures.insert(id, texture);
        id
    }

    fn set_byte_size(&mut self, id: TextureId) {
        if let Some(texture) = self.textures.get_mut(&id) {
            let size = if texture.compressed {
                texture.byte_size
            } else {
                texture.storage_bytes()
            };
            self.allocated_bytes = self.allocated_bytes - texture.byte_size + size;
            texture.byte_size = size;
        }
    }

    fn create_native(ctx: &mut GpuContext<'_>) -> Result<NativeTexture, ResourceError> {
        if ctx.api.is_context_lost() {
            return Err(ResourceError::ContextLost);
        }
        ctx.api
            .create_texture()
            .ok_or(ResourceError::AllocationFailed(ResourceKind::Texture))
    }

    /// Uploads target the active unit, so the unit is selected even when the
    /// binding itself is already in place.
    fn bind_for_upload(ctx: &mut GpuContext<'_>, target: TextureBindTarget, native: NativeTexture) {
        ctx.cache.active_texture(ctx.api, UPLOAD_UNIT, false);
        ctx.cache
            .bind_texture(ctx.api, UPLOAD_UNIT, target, Some(native), false);
    }

    fn apply_sampling(ctx: &mut GpuContext<'_>, texture: &InternalTexture) {
        let target = texture.bind_target();
        let filters = texture.sampling.filters(texture.has_mipmaps);
        ctx.api.tex_parameter(target, TexParameter::MagFilter(filters.mag));
        ctx.api.tex_parameter(target, TexParameter::MinFilter(filters.min));
    }

    fn apply_wrapping(ctx: &mut GpuContext<'_>, texture: &InternalTexture) {
        let target = texture.bind_target();
        ctx.api.tex_parameter(target, TexParameter::WrapS(texture.wrap_u));
        ctx.api.tex_parameter(target, TexParameter::WrapT(texture.wrap_v));
        if texture.is_cube && ctx.caps.is_version_2() {
            ctx.api.tex_parameter(target, TexParameter::WrapR(texture.wrap_r));
        }
    }

    /// Storage size for an upload of `width` x `height`.
    fn upload_size(&self, ctx: &GpuContext<'_>, width: u32, height: u32) -> (u32, u32) {
        let max = ctx.caps.max_texture_size.max(1);
        if ctx.caps.npot {
            (width.min(max), height.min(max))
        } else {
            (
                power_of_two_size(width, max, self.pot_mode),
                power_of_two_size(height, max, self.pot_mode),
            )
        }
    }

    /// Uploads `image` into `target` of `native`, which must be bound,
    /// resizing when the storage size differs from the image size.
    fn upload_image(
        ctx: &mut GpuContext<'_>,
        rescaler: &mut GpuRescaler,
        native: NativeTexture,
        storage: (u32, u32),
        invert_y: bool,
        target: TexImageTarget,
        image: &CpuImage,
    ) -> Result<(), ResourceError> {
        let (width, height) = storage;
        ctx.api.pixel_store(PixelStore::UnpackFlipY(invert_y));

        if image.width == width && image.height == height {
            ctx.api.tex_image_2d(
                target,
                0,
                width,
                height,
                image.format,
                image.ty,
                Some(&image.pixels),
            );
            return Ok(());
        }

        let max = ctx.caps.max_texture_size;
        let cpu_path = image.width > max
            || image.height > max
            || !ctx.caps.hardware_texture_rescaling
            || target != TexImageTarget::Texture2D;
        if cpu_path {
            let resized = pot::resize_image(image, width, height).ok_or_else(|| {
                ResourceError::Unsupported(format!(
                    "cannot resize {:?}/{:?} images on the CPU",
                    image.format, image.ty
                ))
            })?;
            log::debug!(
                "Resized {}x{} image to {width}x{height} on the CPU",
                image.width,
                image.height
            );
            ctx.api.tex_image_2d(
                target,
                0,
                width,
                height,
                resized.format,
                resized.ty,
                Some(&resized.pixels),
            );
            return Ok(());
        }

        let scratch = Self::create_native(ctx)?;
        Self::bind_for_upload(ctx, TextureBindTarget::Texture2D, scratch);
        ctx.api.tex_image_2d(
            TexImageTarget::Texture2D,
            0,
            image.width,
            image.height,
            image.format,
            image.ty,
            Some(&image.pixels),
        );
        let linear = SamplingMode::LinearLinear.filters(false);
        ctx.api
            .tex_parameter(TextureBindTarget::Texture2D, TexParameter::MagFilter(linear.mag));
        ctx.api
            .tex_parameter(TextureBindTarget::Texture2D, TexParameter::MinFilter(linear.min));
        ctx.api
            .tex_parameter(TextureBindTarget::Texture2D, TexParameter::WrapS(WrapMode::Clamp));
        ctx.api
            .tex_parameter(TextureBindTarget::Texture2D, TexParameter::WrapT(WrapMode::Clamp));

        Self::bind_for_upload(ctx, TextureBindTarget::Texture2D, native);
        ctx.api.tex_image_2d(
            TexImageTarget::Texture2D,
            0,
            width,
            height,
            image.format,
            image.ty,
            None,
        );
        let result = rescaler.rescale(ctx, scratch, native, width, height);
        ctx.cache.forget_texture(scratch);
        ctx.api.delete_texture(scratch);
        Self::bind_for_upload(ctx, TextureBindTarget::Texture2D, native);
        result
    }

    /// Uploads decoded content into a texture and finalizes it.
    fn upload_decoded_into(
        &mut self,
        ctx: &mut GpuContext<'_>,
        id: TextureId,
        decoded: &DecodedTexture,
    ) -> Result<(), ResourceError> {
        let (width, height) = decoded.size();
        let (storage_w, storage_h) = match decoded {
            DecodedTexture::Pixels(_) => self.upload_size(ctx, width, height),
            DecodedTexture::Compressed(_) => (width, height),
        };
        let missing = self.missing(id);
        let texture = self.textures.get_mut(&id).ok_or(missing)?;
        let native = match texture.native {
            Some(native) => native,
            None => {
                let native = Self::create_native(ctx)?;
                texture.native = Some(native);
                native
            }
        };
        texture.base_width = width;
        texture.base_height = height;
        texture.width = storage_w;
        texture.height = storage_h;
        Self::bind_for_upload(ctx, texture.bind_target(), native);

        match decoded {
            DecodedTexture::Pixels(image) => {
                texture.format = image.format;
                texture.ty = image.ty;
                texture.compressed = false;
                texture.empty_storage = false;
                let storage = (storage_w, storage_h);
                for target in texture.image_targets() {
                    Self::upload_image(
                        ctx,
                        &mut self.rescaler,
                        native,
                        storage,
                        texture.invert_y,
                        target,
                        image,
                    )?;
                }
                texture.has_mipmaps = texture.generate_mipmaps;
                if texture.has_mipmaps {
                    ctx.api.generate_mipmap(texture.bind_target());
                }
            }
            DecodedTexture::Compressed(image) => {
                texture.compressed = true;
                texture.empty_storage = false;
                texture.has_mipmaps = image.levels.len() > 1;
                let mut bytes = 0;
                for target in texture.image_targets() {
                    for (level, data) in image.levels.iter().enumerate() {
                        ctx.api.compressed_tex_image_2d(
                            target,
                            level as u32,
                            image.format,
                            (width >> level).max(1),
                            (height >> level).max(1),
                            data,
                        );
                        bytes += data.len();
                    }
                }
                self.allocated_bytes = self.allocated_bytes - texture.byte_size + bytes;
                texture.byte_size = bytes;
            }
        }

        let texture = self.texture_mut(id)?;
        Self::apply_sampling(ctx, texture);
        Self::apply_wrapping(ctx, texture);
        texture.readiness = TextureReadiness::Ready;
        texture.source = texture.original_source;
        self.set_byte_size(id);
        Ok(())
    }

    // --- URL textures ---

    /// Registers a texture that will be filled by a load.
    ///
    /// Storage is created immediately so the id can be bound before the
    /// content arrives.
    pub fn create_url_texture(
        &mut self,
        ctx: &mut GpuContext<'_>,
        url: &str,
        options: &TextureLoadOptions,
    ) -> Result<TextureId, ResourceError> {
        self.create_loaded_texture(ctx, url, options, Some(options.cache_key(url)))
    }

    /// Registers a texture filled by decoding in-memory bytes. Such textures
    /// are never deduplicated.
    pub fn create_buffer_texture(
        &mut self,
        ctx: &mut GpuContext<'_>,
        name: &str,
        options: &TextureLoadOptions,
    ) -> Result<TextureId, ResourceError> {
        self.create_loaded_texture(ctx, name, options, None)
    }

    fn create_loaded_texture(
        &mut self,
        ctx: &mut GpuContext<'_>,
        url: &str,
        options: &TextureLoadOptions,
        cache_key: Option<String>,
    ) -> Result<TextureId, ResourceError> {
        let native = Self::create_native(ctx)?;
        let mut texture = InternalTexture::new(TextureSource::Url, 0, 0);
        texture.native = Some(native);
        texture.generate_mipmaps = !options.no_mipmap;
        texture.invert_y = options.invert_y;
        texture.sampling = options.sampling_mode;
        texture.url = Some(url.to_string());
        texture.cache_key = cache_key;
        Ok(self.insert(texture))
    }

    /// Uploads the result of a completed load.
    pub fn upload_decoded(
        &mut self,
        ctx: &mut GpuContext<'_>,
        id: TextureId,
        decoded: DecodedTexture,
    ) -> Result<(), ResourceError> {
        self.upload_decoded_into(ctx, id, &decoded)?;
        if self.retain_sources {
            self.texture_mut(id)?.retained = Some(decoded);
        }
        Ok(())
    }

    /// Marks a load as failed for good. The texture stays live for its owners
    /// but is never deduplicated again.
    pub fn mark_failed(&mut self, id: TextureId) {
        if let Some(texture) = self.textures.get_mut(&id) {
            texture.readiness = TextureReadiness::Failed;
            if let Some(key) = texture.cache_key.take() {
                self.by_key.remove(&key);
            }
        }
    }

    // --- Raw textures ---

    /// Creates a texture from caller-provided bytes, or empty storage when
    /// `data` is `None`.
    ///
    /// Float types the context cannot store are converted to 8-bit, and
    /// sampling drops to nearest when linear filtering of the type is not
    /// available.
    pub fn create_raw_texture(
        &mut self,
        ctx: &mut GpuContext<'_>,
        data: Option<&[u8]>,
        descriptor: RawTextureDescriptor,
    ) -> Result<TextureId, ResourceError> {
        let native = Self::create_native(ctx)?;
        let mut texture = InternalTexture::new(TextureSource::Raw, descriptor.width, descriptor.height);
        texture.native = Some(native);
        texture.format = descriptor.format;
        texture.ty = descriptor.ty;
        texture.generate_mipmaps = descriptor.generate_mipmaps;
        texture.invert_y = descriptor.invert_y;
        texture.sampling = descriptor.sampling_mode;
        texture.wrap_u = WrapMode::Clamp;
        texture.wrap_v = WrapMode::Clamp;
        let id = self.insert(texture);
        self.update_raw_texture(ctx, id, data, descriptor.format, descriptor.ty)?;
        Ok(id)
    }

    /// Replaces the content of a raw texture.
    pub fn update_raw_texture(
        &mut self,
        ctx: &mut GpuContext<'_>,
        id: TextureId,
        data: Option<&[u8]>,
        format: TextureFormat,
        ty: TextureType,
    ) -> Result<(), ResourceError> {
        let supported = ctx.caps.supported_texture_type(ty);
        let pixels = data.map(|bytes| {
            if supported == ty {
                bytes.to_vec()
            } else {
                log::warn!("{ty:?} textures are not supported, converting to {supported:?}");
                downgrade_to_unorm8(bytes, ty)
            }
        });
        let linear_ok = ctx.caps.supports_linear_filtering(supported);
        let retain = self.retain_sources;
        let texture = self.texture_mut(id)?;
        if !linear_ok {
            texture.sampling = SamplingMode::NearestNearest;
        }
        texture.format = format;
        texture.ty = supported;
        let width = texture.base_width;
        let height = texture.base_height;
        match pixels {
            Some(pixels) => {
                let image = DecodedTexture::Pixels(CpuImage {
                    width,
                    height,
                    format,
                    ty: supported,
                    pixels,
                });
                self.upload_decoded_into(ctx, id, &image)?;
                if retain {
                    self.texture_mut(id)?.retained = Some(image);
                }
                Ok(())
            }
            None => self.allocate_empty(ctx, id),
        }
    }

    /// Allocates storage without content and marks the texture ready.
    fn allocate_empty(&mut self, ctx: &mut GpuContext<'_>, id: TextureId) -> Result<(), ResourceError> {
        let (width, height) = {
            let texture = self.texture_mut(id)?;
            (texture.base_width, texture.base_height)
        };
        let (storage_w, storage_h) = self.upload_size(ctx, width, height);
        let texture = self.texture_mut(id)?;
        let native = match texture.native {
            Some(native) => native,
            None => {
                let native = Self::create_native(ctx)?;
                texture.native = Some(native);
                native
            }
        };
        texture.width = storage_w;
        texture.height = storage_h;
        texture.empty_storage = true;
        Self::bind_for_upload(ctx, texture.bind_target(), native);
        for target in texture.image_targets() {
            ctx.api.tex_image_2d(
                target,
                0,
                storage_w,
                storage_h,
                texture.format,
                texture.ty,
                None,
            );
        }
        texture.has_mipmaps = texture.generate_mipmaps;
        if texture.has_mipmaps {
            ctx.api.generate_mipmap(texture.bind_target());
        }
        Self::apply_sampling(ctx, texture);
        Self::apply_wrapping(ctx, texture);
        texture.readiness = TextureReadiness::Ready;
        self.set_byte_size(id);
        Ok(())
    }

    // --- Dynamic and video textures ---

    /// Creates a texture refreshed by the caller with
    /// [`update_dynamic_texture`](Self::update_dynamic_texture).
    pub fn create_dynamic_texture(
        &mut self,
        ctx: &mut GpuContext<'_>,
        width: u32,
        height: u32,
        generate_mipmaps: bool,
        sampling_mode: SamplingMode,
    ) -> Result<TextureId, ResourceError> {
        let native = Self::create_native(ctx)?;
        let (storage_w, storage_h) = self.upload_size(ctx, width, height);
        let mut texture = InternalTexture::new(TextureSource::Dynamic, width, height);
        texture.native = Some(native);
        texture.width = storage_w;
        texture.height = storage_h;
        texture.generate_mipmaps = generate_mipmaps;
        texture.sampling = sampling_mode;
        Self::bind_for_upload(ctx, TextureBindTarget::Texture2D, native);
        Self::apply_sampling(ctx, &texture);
        Ok(self.insert(texture))
    }

    /// Uploads a new frame of a dynamic texture.
    pub fn update_dynamic_texture(
        &mut self,
        ctx: &mut GpuContext<'_>,
        id: TextureId,
        image: &CpuImage,
        invert_y: bool,
        premultiply_alpha: bool,
    ) -> Result<(), ResourceError> {
        if ctx.api.is_context_lost() {
            return Err(ResourceError::ContextLost);
        }
        self.texture_mut(id)?.invert_y = invert_y;
        ctx.api
            .pixel_store(PixelStore::UnpackPremultiplyAlpha(premultiply_alpha));
        let result = self.upload_decoded_into(ctx, id, &DecodedTexture::Pixels(image.clone()));
        if premultiply_alpha {
            ctx.api.pixel_store(PixelStore::UnpackPremultiplyAlpha(false));
        }
        result
    }

    /// Creates a texture fed by an external video source.
    pub fn create_video_texture(
        &mut self,
        ctx: &mut GpuContext<'_>,
        width: u32,
        height: u32,
        generate_mipmaps: bool,
        sampling_mode: SamplingMode,
    ) -> Result<TextureId, ResourceError> {
        let id = self.create_dynamic_texture(ctx, width, height, generate_mipmaps, sampling_mode)?;
        let texture = self.texture_mut(id)?;
        texture.wrap_u = WrapMode::Clamp;
        texture.wrap_v = WrapMode::Clamp;
        Ok(id)
    }

    /// Uploads a video frame.
    ///
    /// Frames go through the direct external upload when the context supports
    /// it and through a CPU copy otherwise.
    pub fn update_video_texture(
        &mut self,
        ctx: &mut GpuContext<'_>,
        id: TextureId,
        frame: &ExternalFrame,
        invert_y: bool,
    ) -> Result<(), ResourceError> {
        if ctx.api.is_context_lost() {
            return Err(ResourceError::ContextLost);
        }
        let (storage_w, storage_h) = self.upload_size(ctx, frame.width, frame.height);
        let direct = ctx.caps.direct_external_upload
            && storage_w == frame.width
            && storage_h == frame.height;
        if !direct {
            let image = CpuImage::rgba8(frame.width, frame.height, frame.pixels.clone());
            return self.update_dynamic_texture(ctx, id, &image, invert_y, false);
        }

        let texture = self.texture_mut(id)?;
        let native = match texture.native {
            Some(native) => native,
            None => {
                let native = Self::create_native(ctx)?;
                texture.native = Some(native);
                native
            }
        };
        texture.invert_y = invert_y;
        texture.base_width = frame.width;
        texture.base_height = frame.height;
        texture.width = frame.width;
        texture.height = frame.height;
        Self::bind_for_upload(ctx, TextureBindTarget::Texture2D, native);
        ctx.api.pixel_store(PixelStore::UnpackFlipY(invert_y));
        ctx.api.tex_image_external(TexImageTarget::Texture2D, frame);
        texture.has_mipmaps = texture.generate_mipmaps;
        if texture.has_mipmaps {
            ctx.api.generate_mipmap(TextureBindTarget::Texture2D);
        }
        Self::apply_sampling(ctx, texture);
        Self::apply_wrapping(ctx, texture);
        texture.readiness = TextureReadiness::Ready;
        texture.source = texture.original_source;
        self.set_byte_size(id);
        Ok(())
    }

    // --- Sampling ---

    /// Changes the sampling mode of a texture.
    pub fn update_texture_sampling_mode(
        &mut self,
        ctx: &mut GpuContext<'_>,
        id: TextureId,
        mode: SamplingMode,
    ) -> Result<(), ResourceError> {
        let texture = self.texture_mut(id)?;
        texture.sampling = mode;
        if let Some(native) = texture.native {
            Self::bind_for_upload(ctx, texture.bind_target(), native);
            Self::apply_sampling(ctx, texture);
        }
        Ok(())
    }

    /// Changes the wrap modes of a texture. `None` keeps the current mode.
    pub fn update_texture_wrapping(
        &mut self,
        ctx: &mut GpuContext<'_>,
        id: TextureId,
        wrap_u: Option<WrapMode>,
        wrap_v: Option<WrapMode>,
        wrap_r: Option<WrapMode>,
    ) -> Result<(), ResourceError> {
        let texture = self.texture_mut(id)?;
        texture.wrap_u = wrap_u.unwrap_or(texture.wrap_u);
        texture.wrap_v = wrap_v.unwrap_or(texture.wrap_v);
        texture.wrap_r = wrap_r.unwrap_or(texture.wrap_r);
        if let Some(native) = texture.native {
            Self::bind_for_upload(ctx, texture.bind_target(), native);
            Self::apply_wrapping(ctx, texture);
        }
        Ok(())
    }

    /// Sets the anisotropic filtering level, clamped to what the context allows.
    pub fn update_texture_anisotropy(
        &mut self,
        ctx: &mut GpuContext<'_>,
        id: TextureId,
        level: f32,
    ) -> Result<(), ResourceError> {
        let max = ctx.caps.max_anisotropy;
        let texture = self.texture_mut(id)?;
        if max <= 1.0 {
            return Ok(());
        }
        if let Some(native) = texture.native {
            Self::bind_for_upload(ctx, texture.bind_target(), native);
            ctx.api.tex_parameter(
                texture.bind_target(),
                TexParameter::MaxAnisotropy(level.clamp(1.0, max)),
            );
        }
        Ok(())
    }

    /// Regenerates the mip chain from level 0.
    pub fn generate_mipmaps(&mut self, ctx: &mut GpuContext<'_>, id: TextureId) -> Result<(), ResourceError> {
        let texture = self.texture_mut(id)?;
        let Some(native) = texture.native else {
            return Ok(());
        };
        Self::bind_for_upload(ctx, texture.bind_target(), native);
        ctx.api.generate_mipmap(texture.bind_target());
        if !texture.has_mipmaps {
            texture.has_mipmaps = true;
            Self::apply_sampling(ctx, texture);
            self.set_byte_size(id);
        }
        Ok(())
    }

    /// Binds a texture to a sampler unit.
    ///
    /// Textures that are not ready are replaced by the matching built-in empty
    /// texture. Unknown ids are ignored.
    pub fn bind_to_unit(&mut self, ctx: &mut GpuContext<'_>, unit: u32, id: TextureId) {
        let Some(texture) = self.textures.get(&id) else {
            log::debug!("Ignoring bind of unknown texture {id:?}");
            return;
        };
        let target = texture.bind_target();
        let native = if texture.is_ready() {
            texture.native
        } else {
            let fallback = if texture.is_cube {
                self.empty_cube_texture(ctx)
            } else {
                self.empty_texture(ctx)
            };
            fallback.ok().and_then(|e| self.native(e))
        };
        ctx.cache.bind_texture(ctx.api, unit, target, native, false);
    }

    // --- Render targets ---

    /// Creates a texture with a framebuffer to render into.
    ///
    /// Without NPOT support a target with mipmaps is rounded up to powers of
    /// two, capped at the maximum texture size.
    pub fn create_render_target_texture(
        &mut self,
        ctx: &mut GpuContext<'_>,
        size: Extent2D,
        options: RenderTargetOptions,
    ) -> Result<TextureId, ResourceError> {
        let max = if options.is_cube {
            ctx.caps.max_cube_map_size
        } else {
            ctx.caps.max_texture_size
        };
        let (width, height) = if options.generate_mipmaps && !ctx.caps.npot {
            (
                power_of_two_size(size.width, max, PotMode::Ceiling),
                power_of_two_size(size.height, max, PotMode::Ceiling),
            )
        } else {
            (size.width.min(max.max(1)), size.height.min(max.max(1)))
        };

        let mut ty = ctx.caps.supported_texture_type(options.ty);
        if !ctx.caps.supports_render_to(ty) {
            log::warn!("Cannot render to {ty:?} textures, falling back to UnsignedByte");
            ty = TextureType::UnsignedByte;
        }
        let mut sampling = options.sampling_mode;
        if !ctx.caps.supports_linear_filtering(ty) {
            sampling = SamplingMode::NearestNearest;
        }

        let native = Self::create_native(ctx)?;
        let mut texture = InternalTexture::new(TextureSource::RenderTarget, size.width, size.height);
        texture.native = Some(native);
        texture.width = width;
        texture.height = height;
        texture.format = options.format;
        texture.ty = ty;
        texture.is_cube = options.is_cube;
        texture.sampling = sampling;
        texture.generate_mipmaps = options.generate_mipmaps;
        texture.wrap_u = WrapMode::Clamp;
        texture.wrap_v = WrapMode::Clamp;
        texture.wrap_r = WrapMode::Clamp;
        texture.render_target = Some(RenderTargetParts {
            framebuffer: None,
            depth_stencil_buffer: None,
            msaa_framebuffer: None,
            msaa_color_buffer: None,
            samples: 1,
            options: RenderTargetOptions {
                ty,
                sampling_mode: sampling,
                ..options
            },
            depth_stencil_texture: None,
        });

        if let Err(err) = Self::build_render_target(ctx, &mut texture) {
            Self::destroy_natives(ctx, &mut texture);
            return Err(err);
        }
        texture.readiness = TextureReadiness::Ready;
        texture.byte_size = texture.storage_bytes();
        let id = self.insert(texture);
        log::debug!("Created render target {id:?} ({width}x{height})");
        Ok(id)
    }

    /// Allocates the color storage, the framebuffer, and the attachments of
    /// a render target whose native texture exists.
    fn build_render_target(
        ctx: &mut GpuContext<'_>,
        texture: &mut InternalTexture,
    ) -> Result<(), ResourceError> {
        let native = texture
            .native
            .ok_or(ResourceError::AllocationFailed(ResourceKind::Texture))?;
        let target = texture.bind_target();
        Self::bind_for_upload(ctx, target, native);
        for image in texture.image_targets() {
            ctx.api.tex_image_2d(
                image,
                0,
                texture.width,
                texture.height,
                texture.format,
                texture.ty,
                None,
            );
        }
        texture.has_mipmaps = texture.generate_mipmaps;
        Self::apply_sampling(ctx, texture);
        Self::apply_wrapping(ctx, texture);
        if texture.has_mipmaps {
            ctx.api.generate_mipmap(target);
        }

        let framebuffer = ctx
            .api
            .create_framebuffer()
            .ok_or(ResourceError::AllocationFailed(ResourceKind::Framebuffer))?;
        let first_image = texture
            .image_targets()
            .first()
            .copied()
            .unwrap_or(TexImageTarget::Texture2D);
        let (width, height) = (texture.width, texture.height);
        let Some(parts) = texture.render_target.as_mut() else {
            ctx.api.delete_framebuffer(framebuffer);
            return Err(ResourceError::InvalidHandle {
                kind: ResourceKind::Framebuffer,
                id: usize::MAX,
            });
        };
        parts.framebuffer = Some(framebuffer);
        ctx.cache.bind_framebuffer(ctx.api, Some(framebuffer), false);
        ctx.api.framebuffer_texture_2d(
            FramebufferTarget::Framebuffer,
            Attachment::Color0,
            first_image,
            Some(native),
            0,
        );

        let requested = parts.options.samples;
        Self::build_attachments(ctx, parts, width, height, requested)?;
        ctx.cache.bind_framebuffer(ctx.api, None, false);
        Ok(())
    }

    /// Clamps a requested sample count to what the context allows.
    fn effective_samples(ctx: &GpuContext<'_>, requested: u32, is_cube: bool) -> u32 {
        if !ctx.caps.is_version_2() || is_cube {
            return 1;
        }
        requested.clamp(1, ctx.caps.max_samples.max(1))
    }

    /// Creates the depth/stencil renderbuffer and, when multisampled, the
    /// multisample framebuffer with its color renderbuffer.
    fn build_attachments(
        ctx: &mut GpuContext<'_>,
        parts: &mut RenderTargetParts,
        width: u32,
        height: u32,
        requested: u32,
    ) -> Result<(), ResourceError> {
        let samples = Self::effective_samples(ctx, requested, parts.options.is_cube);
        parts.samples = samples;

        if samples > 1 {
            let msaa_framebuffer = ctx
                .api
                .create_framebuffer()
                .ok_or(ResourceError::AllocationFailed(ResourceKind::Framebuffer))?;
            parts.msaa_framebuffer = Some(msaa_framebuffer);
            let color = ctx
                .api
                .create_renderbuffer()
                .ok_or(ResourceError::AllocationFailed(ResourceKind::Framebuffer))?;
            parts.msaa_color_buffer = Some(color);
            ctx.cache.bind_framebuffer(ctx.api, Some(msaa_framebuffer), false);
            ctx.cache.bind_renderbuffer(ctx.api, Some(color), false);
            ctx.api
                .renderbuffer_storage(RenderbufferFormat::Rgba8, width, height, samples);
            ctx.api.framebuffer_renderbuffer(
                FramebufferTarget::Framebuffer,
                Attachment::Color0,
                Some(color),
            );
        }

        let depth = parts.options.generate_depth_buffer;
        let stencil = parts.options.generate_stencil_buffer;
        let (format, attachment) = match (depth, stencil) {
            (true, true) => (RenderbufferFormat::Depth24Stencil8, Attachment::DepthStencil),
            (true, false) => (RenderbufferFormat::Depth16, Attachment::Depth),
            (false, true) => (RenderbufferFormat::Stencil8, Attachment::Stencil),
            (false, false) => {
                ctx.cache.bind_renderbuffer(ctx.api, None, false);
                return Ok(());
            }
        };
        let renderbuffer = ctx
            .api
            .create_renderbuffer()
            .ok_or(ResourceError::AllocationFailed(ResourceKind::Framebuffer))?;
        parts.depth_stencil_buffer = Some(renderbuffer);
        let draw_framebuffer = parts.msaa_framebuffer.or(parts.framebuffer);
        ctx.cache.bind_framebuffer(ctx.api, draw_framebuffer, false);
        ctx.cache.bind_renderbuffer(ctx.api, Some(renderbuffer), false);
        ctx.api.renderbuffer_storage(format, width, height, samples);
        ctx.api.framebuffer_renderbuffer(
            FramebufferTarget::Framebuffer,
            attachment,
            Some(renderbuffer),
        );
        ctx.cache.bind_renderbuffer(ctx.api, None, false);
        Ok(())
    }

    fn destroy_attachments(ctx: &mut GpuContext<'_>, parts: &mut RenderTargetParts) {
        if let Some(fb) = parts.msaa_framebuffer.take() {
            ctx.cache.forget_framebuffer(fb);
            ctx.api.delete_framebuffer(fb);
        }
        for rb in [parts.msaa_color_buffer.take(), parts.depth_stencil_buffer.take()]
            .into_iter()
            .flatten()
        {
            ctx.cache.forget_renderbuffer(rb);
            ctx.api.delete_renderbuffer(rb);
        }
    }

    /// Changes the sample count of a render target, recreating the
    /// multisample and depth/stencil attachments. The color texture is kept.
    ///
    /// Returns the effective sample count.
    pub fn update_render_target_samples(
        &mut self,
        ctx: &mut GpuContext<'_>,
        id: TextureId,
        samples: u32,
    ) -> Result<u32, ResourceError> {
        if ctx.api.is_context_lost() {
            return Err(ResourceError::ContextLost);
        }
        let texture = self.texture_mut(id)?;
        let (width, height) = (texture.width, texture.height);
        let Some(parts) = texture.render_target.as_mut() else {
            return Err(ResourceError::Unsupported(format!(
                "texture {id:?} is not a render target"
            )));
        };
        let effective = Self::effective_samples(ctx, samples, parts.options.is_cube);
        if effective == parts.samples {
            return Ok(effective);
        }
        Self::destroy_attachments(ctx, parts);
        parts.options.samples = samples;
        Self::build_attachments(ctx, parts, width, height, samples)?;
        ctx.cache.bind_framebuffer(ctx.api, None, false);
        log::debug!("Render target {id:?} now uses {effective} samples");
        Ok(effective)
    }

    /// Creates a depth (and optionally stencil) texture that can be attached
    /// to render targets.
    pub fn create_depth_stencil_texture(
        &mut self,
        ctx: &mut GpuContext<'_>,
        size: Extent2D,
        with_stencil: bool,
    ) -> Result<TextureId, ResourceError> {
        if !ctx.caps.depth_texture {
            return Err(ResourceError::Unsupported(
                "depth textures are not supported by this context".to_string(),
            ));
        }
        let native = Self::create_native(ctx)?;
        let mut texture = InternalTexture::new(TextureSource::DepthStencil, size.width, size.height);
        texture.native = Some(native);
        if with_stencil {
            texture.format = TextureFormat::DepthStencil;
            texture.ty = TextureType::UnsignedInt24_8;
        } else {
            texture.format = TextureFormat::Depth;
            texture.ty = TextureType::UnsignedInt;
        }
        texture.sampling = SamplingMode::NearestNearest;
        texture.wrap_u = WrapMode::Clamp;
        texture.wrap_v = WrapMode::Clamp;
        Self::allocate_depth_storage(ctx, &texture, native);
        texture.readiness = TextureReadiness::Ready;
        texture.byte_size = texture.storage_bytes();
        Ok(self.insert(texture))
    }

    fn allocate_depth_storage(ctx: &mut GpuContext<'_>, texture: &InternalTexture, native: NativeTexture) {
        Self::bind_for_upload(ctx, TextureBindTarget::Texture2D, native);
        ctx.api.tex_image_2d(
            TexImageTarget::Texture2D,
            0,
            texture.width,
            texture.height,
            texture.format,
            texture.ty,
            None,
        );
        Self::apply_sampling(ctx, texture);
        Self::apply_wrapping(ctx, texture);
    }

    fn depth_attachment(format: TextureFormat) -> Attachment {
        if format == TextureFormat::DepthStencil {
            Attachment::DepthStencil
        } else {
            Attachment::Depth
        }
    }

    /// Attaches a depth texture to a render target, or detaches it with
    /// `None`. The render target does not own the depth texture.
    pub fn set_depth_stencil_texture(
        &mut self,
        ctx: &mut GpuContext<'_>,
        render_target: TextureId,
        depth: Option<TextureId>,
    ) -> Result<(), ResourceError> {
        let Some(depth_id) = depth else {
            let previous = self
                .textures
                .get(&render_target)
                .and_then(|t| t.render_target.as_ref())
                .and_then(|p| p.depth_stencil_texture);
            if let Some(previous) = previous {
                let format = self
                    .textures
                    .get(&previous)
                    .map(|t| t.format)
                    .unwrap_or(TextureFormat::Depth);
                self.detach_depth_texture(ctx, render_target, format);
            }
            return Ok(());
        };
        let missing = self.missing(depth_id);
        let (native, format) = self
            .textures
            .get(&depth_id)
            .map(|t| (t.native, t.format))
            .ok_or(missing)?;
        let texture = self.texture_mut(render_target)?;
        let Some(parts) = texture.render_target.as_mut() else {
            return Err(ResourceError::Unsupported(format!(
                "texture {render_target:?} is not a render target"
            )));
        };
        ctx.cache.bind_framebuffer(ctx.api, parts.framebuffer, false);
        ctx.api.framebuffer_texture_2d(
            FramebufferTarget::Framebuffer,
            Self::depth_attachment(format),
            TexImageTarget::Texture2D,
            native,
            0,
        );
        parts.depth_stencil_texture = Some(depth_id);
        ctx.cache.bind_framebuffer(ctx.api, None, false);
        Ok(())
    }

    fn detach_depth_texture(&mut self, ctx: &mut GpuContext<'_>, render_target: TextureId, format: TextureFormat) {
        let Some(parts) = self
            .textures
            .get_mut(&render_target)
            .and_then(|t| t.render_target.as_mut())
        else {
            return;
        };
        parts.depth_stencil_texture = None;
        if let Some(framebuffer) = parts.framebuffer {
            ctx.cache.bind_framebuffer(ctx.api, Some(framebuffer), false);
            ctx.api.framebuffer_texture_2d(
                FramebufferTarget::Framebuffer,
                Self::depth_attachment(format),
                TexImageTarget::Texture2D,
                None,
                0,
            );
            ctx.cache.bind_framebuffer(ctx.api, None, false);
        }
    }

    /// Binds a render target for drawing and sets the viewport to its size.
    ///
    /// Multisampled targets draw into their multisample framebuffer. For cube
    /// targets `face` selects the attached face.
    pub fn bind_framebuffer(
        &mut self,
        ctx: &mut GpuContext<'_>,
        id: TextureId,
        face: Option<CubeFace>,
    ) -> Result<(), ResourceError> {
        if let Some(current) = self.bound_render_target {
            if current != id {
                self.unbind_framebuffer(ctx, current, false)?;
            }
        }
        let missing = self.missing(id);
        let texture = self.textures.get(&id).ok_or(missing)?;
        let parts = texture
            .render_target
            .as_ref()
            .ok_or_else(|| ResourceError::Unsupported(format!("texture {id:?} is not a render target")))?;
        let framebuffer = parts.msaa_framebuffer.or(parts.framebuffer);
        ctx.cache.bind_framebuffer(ctx.api, framebuffer, false);
        if texture.is_cube {
            let face = face.unwrap_or(CubeFace::PositiveX);
            ctx.api.framebuffer_texture_2d(
                FramebufferTarget::Framebuffer,
                Attachment::Color0,
                TexImageTarget::CubeFace(face),
                texture.native,
                0,
            );
        }
        ctx.cache.set_viewport(
            ctx.api,
            Viewport::new(0, 0, texture.width, texture.height),
            false,
        );
        self.bound_render_target = Some(id);
        Ok(())
    }

    /// Finishes rendering into a target: resolves multisampling and
    /// regenerates mips unless `skip_mipmaps` is set. Leaves the default
    /// framebuffer bound.
    pub fn unbind_framebuffer(
        &mut self,
        ctx: &mut GpuContext<'_>,
        id: TextureId,
        skip_mipmaps: bool,
    ) -> Result<(), ResourceError> {
        if self.bound_render_target == Some(id) {
            self.bound_render_target = None;
        }
        let missing = self.missing(id);
        let texture = self.textures.get(&id).ok_or(missing)?;
        let Some(parts) = texture.render_target.as_ref() else {
            return Err(ResourceError::Unsupported(format!(
                "texture {id:?} is not a render target"
            )));
        };
        if let (Some(msaa), Some(resolve)) = (parts.msaa_framebuffer, parts.framebuffer) {
            let rect = Viewport::new(0, 0, texture.width, texture.height);
            ctx.cache.bind_blit_framebuffers(ctx.api, Some(msaa), Some(resolve));
            ctx.api
                .blit_framebuffer(rect, rect, ClearMask::COLOR, BlitFilter::Nearest);
        }
        if texture.has_mipmaps && !skip_mipmaps {
            if let Some(native) = texture.native {
                Self::bind_for_upload(ctx, texture.bind_target(), native);
                ctx.api.generate_mipmap(texture.bind_target());
            }
        }
        ctx.cache.bind_framebuffer(ctx.api, None, false);
        Ok(())
    }

    /// Returns to the default framebuffer with a viewport covering `surface`.
    pub fn restore_default_framebuffer(&mut self, ctx: &mut GpuContext<'_>, surface: Extent2D) {
        match self.bound_render_target {
            Some(id) => {
                if let Err(err) = self.unbind_framebuffer(ctx, id, false) {
                    log::debug!("Failed to unbind render target {id:?}: {err}");
                    ctx.cache.bind_framebuffer(ctx.api, None, false);
                }
            }
            None => ctx.cache.bind_framebuffer(ctx.api, None, false),
        }
        ctx.cache
            .set_viewport(ctx.api, Viewport::from_extent(surface), false);
    }

    // --- Built-in textures ---

    /// A 1x1 transparent texture bound in place of textures that are not ready.
    pub fn empty_texture(&mut self, ctx: &mut GpuContext<'_>) -> Result<TextureId, ResourceError> {
        if let Some(id) = self.empty.filter(|id| self.textures.contains_key(id)) {
            return Ok(id);
        }
        let id = self.create_raw_texture(ctx, Some(&[0; 4]), RawTextureDescriptor::rgba8(1, 1))?;
        self.empty = Some(id);
        Ok(id)
    }

    /// A 1x1 transparent cube texture.
    pub fn empty_cube_texture(&mut self, ctx: &mut GpuContext<'_>) -> Result<TextureId, ResourceError> {
        if let Some(id) = self.empty_cube.filter(|id| self.textures.contains_key(id)) {
            return Ok(id);
        }
        let native = Self::create_native(ctx)?;
        let mut texture = InternalTexture::new(TextureSource::Raw, 1, 1);
        texture.native = Some(native);
        texture.is_cube = true;
        texture.sampling = SamplingMode::Bilinear;
        texture.wrap_u = WrapMode::Clamp;
        texture.wrap_v = WrapMode::Clamp;
        let id = self.insert(texture);
        let face = DecodedTexture::Pixels(CpuImage::rgba8(1, 1, vec![0; 4]));
        self.upload_decoded_into(ctx, id, &face)?;
        if self.retain_sources {
            self.texture_mut(id)?.retained = Some(face);
        }
        self.empty_cube = Some(id);
        Ok(id)
    }

    /// Deletes the built-in empty textures.
    pub fn release_empty_textures(&mut self, ctx: &mut GpuContext<'_>) {
        for id in [self.empty.take(), self.empty_cube.take()].into_iter().flatten() {
            if let Some(mut texture) = self.textures.remove(&id) {
                self.allocated_bytes -= texture.byte_size;
                Self::destroy_natives(ctx, &mut texture);
            }
        }
    }

    // --- Lifetime ---

    /// Adds an owner. Returns the new reference count.
    pub fn retain_texture(&mut self, id: TextureId) -> Result<u32, ResourceError> {
        let texture = self.texture_mut(id)?;
        texture.ref_count += 1;
        Ok(texture.ref_count)
    }

    /// Removes an owner, deleting the texture when none is left.
    /// Returns `true` if the texture was deleted.
    pub fn release_texture(&mut self, ctx: &mut GpuContext<'_>, id: TextureId) -> Result<bool, ResourceError> {
        let texture = self.texture_mut(id)?;
        texture.ref_count = texture.ref_count.saturating_sub(1);
        if texture.ref_count > 0 {
            return Ok(false);
        }
        self.dispose_texture(ctx, id);
        Ok(true)
    }

    fn dispose_texture(&mut self, ctx: &mut GpuContext<'_>, id: TextureId) {
        let Some(mut texture) = self.textures.remove(&id) else {
            return;
        };
        self.allocated_bytes -= texture.byte_size;
        if let Some(key) = &texture.cache_key {
            if self.by_key.get(key) == Some(&id) {
                self.by_key.remove(key);
            }
        }
        if self.bound_render_target == Some(id) {
            self.bound_render_target = None;
        }
        if texture.source == TextureSource::DepthStencil
            || texture.original_source == TextureSource::DepthStencil
        {
            let owners: Vec<TextureId> = self
                .textures
                .iter()
                .filter(|(_, t)| {
                    t.render_target
                        .as_ref()
                        .is_some_and(|p| p.depth_stencil_texture == Some(id))
                })
                .map(|(owner, _)| *owner)
                .collect();
            for owner in owners {
                self.detach_depth_texture(ctx, owner, texture.format);
            }
        }
        Self::destroy_natives(ctx, &mut texture);
        log::trace!("Disposed texture {id:?}");
    }

    fn destroy_natives(ctx: &mut GpuContext<'_>, texture: &mut InternalTexture) {
        if let Some(parts) = texture.render_target.as_mut() {
            Self::destroy_attachments(ctx, parts);
            if let Some(fb) = parts.framebuffer.take() {
                ctx.cache.forget_framebuffer(fb);
                ctx.api.delete_framebuffer(fb);
            }
        }
        if let Some(native) = texture.native.take() {
            ctx.cache.forget_texture(native);
            ctx.api.delete_texture(native);
        }
    }

    /// Drops every native handle after a context loss.
    pub fn mark_context_lost(&mut self) {
        for texture in self.textures.values_mut() {
            texture.native = None;
            if let Some(parts) = texture.render_target.as_mut() {
                parts.framebuffer = None;
                parts.depth_stencil_buffer = None;
                parts.msaa_framebuffer = None;
                parts.msaa_color_buffer = None;
            }
        }
        self.rescaler.invalidate();
        self.bound_render_target = None;
    }

    /// Re-creates every texture after a restore, in creation order.
    ///
    /// Textures with retained content are re-uploaded and render targets are
    /// rebuilt. Loads still in flight get fresh storage and stay pending.
    /// Anything else becomes [`TextureSource::Temp`] until its owner refills
    /// it.
    pub fn rebuild_all(&mut self, ctx: &mut GpuContext<'_>) -> RebuildReport {
        let mut report = RebuildReport::default();
        let mut ids: Vec<TextureId> = self.textures.keys().copied().collect();
        ids.sort();
        for &id in &ids {
            match self.rebuild(ctx, id) {
                Ok(true) => report.rebuilt += 1,
                Ok(false) => report.pending += 1,
                Err(err) => {
                    log::error!("Failed to rebuild texture {id:?}: {err}");
                    if let Some(texture) = self.textures.get_mut(&id) {
                        texture.readiness = TextureReadiness::Pending;
                    }
                    report.failed += 1;
                }
            }
        }

        // Depth textures are re-attached once every texture exists again.
        for &id in &ids {
            let Some((depth, framebuffer)) = self.textures.get(&id).and_then(|t| {
                let parts = t.render_target.as_ref()?;
                Some((parts.depth_stencil_texture?, parts.framebuffer))
            }) else {
                continue;
            };
            let Some((native, format)) = self.textures.get(&depth).map(|d| (d.native, d.format)) else {
                continue;
            };
            ctx.cache.bind_framebuffer(ctx.api, framebuffer, false);
            ctx.api.framebuffer_texture_2d(
                FramebufferTarget::Framebuffer,
                Self::depth_attachment(format),
                TexImageTarget::Texture2D,
                native,
                0,
            );
            ctx.cache.bind_framebuffer(ctx.api, None, false);
        }
        report
    }

    /// Rebuilds one texture. Returns `Ok(true)` when it is ready again.
    fn rebuild(&mut self, ctx: &mut GpuContext<'_>, id: TextureId) -> Result<bool, ResourceError> {
        let texture = self.texture_mut(id)?;
        if texture.readiness == TextureReadiness::Failed {
            return Ok(false);
        }
        let native = Self::create_native(ctx)?;
        texture.native = Some(native);

        match texture.original_source {
            TextureSource::RenderTarget => {
                Self::build_render_target(ctx, texture)?;
                texture.readiness = TextureReadiness::Ready;
                Ok(true)
            }
            TextureSource::DepthStencil => {
                Self::allocate_depth_storage(ctx, texture, native);
                texture.readiness = TextureReadiness::Ready;
                Ok(true)
            }
            _ => {
                if let Some(retained) = texture.retained.take() {
                    let result = self.upload_decoded_into(ctx, id, &retained);
                    if let Some(texture) = self.textures.get_mut(&id) {
                        texture.retained = Some(retained);
                    }
                    return result.map(|_| true);
                }
                if texture.empty_storage {
                    self.allocate_empty(ctx, id)?;
                    return Ok(true);
                }
                let in_flight = texture.source == TextureSource::Url
                    && texture.readiness == TextureReadiness::Pending;
                if !in_flight {
                    texture.source = TextureSource::Temp;
                    texture.readiness = TextureReadiness::Pending;
                }
                Ok(false)
            }
        }
    }

    /// Deletes every texture regardless of reference counts.
    pub fn dispose_all(&mut self, ctx: &mut GpuContext<'_>) {
        for (_, mut texture) in self.textures.drain() {
            Self::destroy_natives(ctx, &mut texture);
        }
        self.rescaler.dispose(ctx);
        self.by_key.clear();
        self.allocated_bytes = 0;
        self.empty = None;
        self.empty_cube = None;
        self.bound_render_target = None;
    }
}

/// Converts float or half-float texels to 8-bit normalized values.
fn downgrade_to_unorm8(bytes: &[u8], from: TextureType) -> Vec<u8> {
    let to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    match from {
        TextureType::Float => bytes
            .chunks_exact(4)
            .map(|c| to_u8(f32::from_le_bytes([c[0], c[1], c[2], c[3]])))
            .collect(),
        TextureType::HalfFloat => bytes
            .chunks_exact(2)
            .map(|c| to_u8(half_to_f32(u16::from_le_bytes([c[0], c[1]]))))
            .collect(),
        _ => bytes.to_vec(),
    }
}

fn half_to_f32(bits: u16) -> f32 {
    let sign = if bits & 0x8000 != 0 { -1.0 } else { 1.0 };
    let exponent = ((bits >> 10) & 0x1f) as i32;
    let mantissa = (bits & 0x3ff) as f32;
    match exponent {
        0 => sign * mantissa * 2f32.powi(-24),
        0x1f if mantissa == 0.0 => sign * f32::INFINITY,
        0x1f => f32::NAN,
        _ => sign * (1.0 + mantissa / 1024.0) * 2f32.powi(exponent - 15),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateCache;
    use ember_core::renderer::{Capabilities, CompressedFormat, CompressedImage};
    use ember_infra::graphics::headless::{GlCall, HeadlessConfig, HeadlessGl};

    fn setup(config: HeadlessConfig) -> (HeadlessGl, StateCache, Capabilities) {
        let mut gl = HeadlessGl::new(config);
        let caps = crate::capability::probe(&mut gl, Default::default());
        (gl, StateCache::new(), caps)
    }

    fn tex_image_sizes(gl: &HeadlessGl) -> Vec<(u32, u32)> {
        gl.calls()
            .iter()
            .filter_map(|c| match c {
                GlCall::TexImage2D { width, height, .. } => Some((*width, *height)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn render_target_rounds_up_without_npot() {
        let (mut gl, mut cache, caps) = setup(HeadlessConfig::version_1());
        assert!(!caps.npot);
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        let mut textures = TextureManager::new(PotMode::Nearest, true);
        let options = RenderTargetOptions {
            generate_mipmaps: true,
            ..Default::default()
        };
        let id = textures
            .create_render_target_texture(&mut ctx, Extent2D::new(257, 257), options)
            .unwrap();
        assert_eq!(textures.get(id).unwrap().size(), Extent2D::new(512, 512));
        assert_eq!(textures.get(id).unwrap().base_size(), Extent2D::new(257, 257));
    }

    #[test]
    fn render_target_rounding_is_capped_by_max_size() {
        let (mut gl, mut cache, mut caps) = setup(HeadlessConfig::version_1());
        caps.max_texture_size = 256;
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        let mut textures = TextureManager::new(PotMode::Nearest, true);
        let options = RenderTargetOptions {
            generate_mipmaps: true,
            ..Default::default()
        };
        let id = textures
            .create_render_target_texture(&mut ctx, Extent2D::new(257, 257), options)
            .unwrap();
        assert_eq!(textures.get(id).unwrap().size(), Extent2D::new(256, 256));
    }

    #[test]
    fn render_target_keeps_size_with_npot() {
        let (mut gl, mut cache, caps) = setup(HeadlessConfig::version_2());
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        let mut textures = TextureManager::new(PotMode::Nearest, true);
        let options = RenderTargetOptions {
            generate_mipmaps: true,
            ..Default::default()
        };
        let id = textures
            .create_render_target_texture(&mut ctx, Extent2D::new(257, 257), options)
            .unwrap();
        assert_eq!(textures.get(id).unwrap().size(), Extent2D::new(257, 257));
    }

    #[test]
    fn changing_samples_keeps_the_color_texture() {
        let (mut gl, mut cache, caps) = setup(HeadlessConfig::version_2());
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        let mut textures = TextureManager::new(PotMode::Nearest, true);
        let id = textures
            .create_render_target_texture(&mut ctx, Extent2D::new(64, 64), Default::default())
            .unwrap();
        let color = textures.native(id);
        let before = textures.get(id).unwrap().render_target().unwrap().clone();
        assert!(before.msaa_framebuffer().is_none());

        let samples = textures.update_render_target_samples(&mut ctx, id, 4).unwrap();
        assert_eq!(samples, 4.min(caps.max_samples));
        let after = textures.get(id).unwrap().render_target().unwrap();
        assert_eq!(textures.native(id), color);
        assert_eq!(after.framebuffer(), before.framebuffer());
        assert!(after.msaa_framebuffer().is_some());
        assert_ne!(after.depth_stencil_buffer(), before.depth_stencil_buffer());
    }

    #[test]
    fn version_1_render_targets_never_multisample() {
        let (mut gl, mut cache, caps) = setup(HeadlessConfig::version_1());
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        let mut textures = TextureManager::new(PotMode::Nearest, true);
        let options = RenderTargetOptions {
            samples: 4,
            ..Default::default()
        };
        let id = textures
            .create_render_target_texture(&mut ctx, Extent2D::new(64, 64), options)
            .unwrap();
        assert_eq!(textures.get(id).unwrap().render_target().unwrap().samples(), 1);
    }

    #[test]
    fn unbinding_a_multisampled_target_resolves_it() {
        let (mut gl, mut cache, caps) = setup(HeadlessConfig::version_2());
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        let mut textures = TextureManager::new(PotMode::Nearest, true);
        let options = RenderTargetOptions {
            samples: 4,
            ..Default::default()
        };
        let id = textures
            .create_render_target_texture(&mut ctx, Extent2D::new(64, 32), options)
            .unwrap();
        textures.bind_framebuffer(&mut ctx, id, None).unwrap();
        assert_eq!(textures.bound_render_target(), Some(id));
        assert_eq!(ctx.cache.viewport().known(), Some(&Viewport::new(0, 0, 64, 32)));

        gl.clear_calls();
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        textures
            .restore_default_framebuffer(&mut ctx, Extent2D::new(800, 600));
        assert_eq!(
            gl.count_calls(|c| matches!(c, GlCall::BlitFramebuffer { .. })),
            1
        );
        assert_eq!(textures.bound_render_target(), None);
    }

    #[test]
    fn npot_image_uses_cpu_resize_without_hardware_rescaling() {
        let (mut gl, mut cache, mut caps) = setup(HeadlessConfig::version_1());
        caps.hardware_texture_rescaling = false;
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        let mut textures = TextureManager::new(PotMode::Ceiling, true);
        let id = textures
            .create_url_texture(&mut ctx, "a.png", &TextureLoadOptions::default())
            .unwrap();
        let image = CpuImage::rgba8(3, 5, vec![255; 3 * 5 * 4]);
        gl.clear_calls();
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        textures
            .upload_decoded(&mut ctx, id, DecodedTexture::Pixels(image))
            .unwrap();

        assert_eq!(tex_image_sizes(&gl), vec![(4, 8)]);
        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::LinkProgram(_))), 0);
        let texture = textures.get(id).unwrap();
        assert!(texture.is_ready());
        assert_eq!(texture.size(), Extent2D::new(4, 8));
        assert_eq!(texture.base_size(), Extent2D::new(3, 5));
    }

    #[test]
    fn npot_image_uses_gpu_rescale_when_available() {
        let (mut gl, mut cache, caps) = setup(HeadlessConfig::version_1());
        assert!(caps.hardware_texture_rescaling);
        let handle = gl.clone();
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        let mut textures = TextureManager::new(PotMode::Ceiling, true);
        let id = textures
            .create_url_texture(&mut ctx, "a.png", &TextureLoadOptions::default())
            .unwrap();
        let image = CpuImage::rgba8(3, 5, vec![255; 3 * 5 * 4]);
        let live_before = handle.live_textures();
        textures
            .upload_decoded(&mut ctx, id, DecodedTexture::Pixels(image))
            .unwrap();

        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::LinkProgram(_))), 1);
        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::DrawArrays { .. })), 1);
        assert_eq!(gl.live_textures(), live_before);
        assert_eq!(textures.get(id).unwrap().size(), Extent2D::new(4, 8));
    }

    #[test]
    fn url_texture_is_pending_until_uploaded() {
        let (mut gl, mut cache, caps) = setup(HeadlessConfig::version_2());
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        let mut textures = TextureManager::new(PotMode::Nearest, true);
        let id = textures
            .create_url_texture(&mut ctx, "a.png", &TextureLoadOptions::default())
            .unwrap();
        assert_eq!(textures.get(id).unwrap().readiness(), TextureReadiness::Pending);
        assert_eq!(textures.find_by_key(&TextureLoadOptions::default().cache_key("a.png")), Some(id));

        textures.mark_failed(id);
        assert_eq!(textures.get(id).unwrap().readiness(), TextureReadiness::Failed);
        assert_eq!(textures.find_by_key(&TextureLoadOptions::default().cache_key("a.png")), None);
    }

    #[test]
    fn compressed_upload_sends_every_level() {
        let (mut gl, mut cache, caps) = setup(HeadlessConfig::version_2());
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        let mut textures = TextureManager::new(PotMode::Nearest, true);
        let id = textures
            .create_url_texture(&mut ctx, "a.ktx", &TextureLoadOptions::default())
            .unwrap();
        let image = CompressedImage {
            format: CompressedFormat::RgbaS3tcDxt5,
            width: 8,
            height: 8,
            levels: vec![vec![0; 64], vec![0; 16], vec![0; 16], vec![0; 16]],
        };
        textures
            .upload_decoded(&mut ctx, id, DecodedTexture::Compressed(image))
            .unwrap();
        assert_eq!(
            gl.count_calls(|c| matches!(c, GlCall::CompressedTexImage2D { .. })),
            4
        );
        let texture = textures.get(id).unwrap();
        assert!(texture.has_mipmaps());
        assert_eq!(texture.byte_size(), 112);
        assert_eq!(textures.allocated_bytes(), 112);
    }

    #[test]
    fn unsupported_float_data_is_converted() {
        let (mut gl, mut cache, mut caps) = setup(HeadlessConfig::version_1().without_all_extensions());
        caps.texture_float = false;
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        let mut textures = TextureManager::new(PotMode::Nearest, true);
        let data: Vec<u8> = [0.0f32, 0.5, 1.0, 2.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let descriptor = RawTextureDescriptor {
            ty: TextureType::Float,
            ..RawTextureDescriptor::rgba8(1, 1)
        };
        let id = textures
            .create_raw_texture(&mut ctx, Some(&data), descriptor)
            .unwrap();
        let texture = textures.get(id).unwrap();
        assert_eq!(texture.texture_type(), TextureType::UnsignedByte);
        assert_eq!(texture.sampling_mode(), SamplingMode::Bilinear);
        assert_eq!(downgrade_to_unorm8(&data, TextureType::Float), vec![0, 128, 255, 255]);
    }

    #[test]
    fn half_float_conversion() {
        assert_eq!(half_to_f32(0x3c00), 1.0);
        assert_eq!(half_to_f32(0x3800), 0.5);
        assert_eq!(half_to_f32(0xc000), -2.0);
        assert_eq!(half_to_f32(0), 0.0);
    }

    #[test]
    fn video_frames_use_direct_upload_when_supported() {
        let (mut gl, mut cache, caps) =
            setup(HeadlessConfig::version_2().with_direct_external_upload(true));
        assert!(caps.direct_external_upload);
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        let mut textures = TextureManager::new(PotMode::Nearest, true);
        let id = textures
            .create_video_texture(&mut ctx, 2, 2, false, SamplingMode::Bilinear)
            .unwrap();
        let frame = ExternalFrame {
            width: 2,
            height: 2,
            pixels: vec![0; 16],
        };
        gl.clear_calls();
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        textures.update_video_texture(&mut ctx, id, &frame, true).unwrap();
        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::TexImageExternal { .. })), 1);
        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::TexImage2D { .. })), 0);
        assert!(textures.get(id).unwrap().is_ready());
    }

    #[test]
    fn video_frames_fall_back_to_cpu_copy() {
        let (mut gl, mut cache, caps) =
            setup(HeadlessConfig::version_2().with_direct_external_upload(false));
        assert!(!caps.direct_external_upload);
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        let mut textures = TextureManager::new(PotMode::Nearest, true);
        let id = textures
            .create_video_texture(&mut ctx, 2, 2, false, SamplingMode::Bilinear)
            .unwrap();
        let frame = ExternalFrame {
            width: 2,
            height: 2,
            pixels: vec![0; 16],
        };
        gl.clear_calls();
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        textures.update_video_texture(&mut ctx, id, &frame, false).unwrap();
        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::TexImageExternal { .. })), 0);
        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::TexImage2D { .. })), 1);
    }

    #[test]
    fn releasing_a_depth_texture_detaches_it() {
        let (mut gl, mut cache, caps) = setup(HeadlessConfig::version_2());
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        let mut textures = TextureManager::new(PotMode::Nearest, true);
        let target = textures
            .create_render_target_texture(&mut ctx, Extent2D::new(32, 32), Default::default())
            .unwrap();
        let depth = textures
            .create_depth_stencil_texture(&mut ctx, Extent2D::new(32, 32), false)
            .unwrap();
        textures
            .set_depth_stencil_texture(&mut ctx, target, Some(depth))
            .unwrap();
        assert_eq!(
            textures.get(target).unwrap().render_target().unwrap().depth_stencil_texture(),
            Some(depth)
        );

        assert!(textures.release_texture(&mut ctx, depth).unwrap());
        assert_eq!(
            textures.get(target).unwrap().render_target().unwrap().depth_stencil_texture(),
            None
        );
    }

    #[test]
    fn reference_counting_deletes_once() {
        let (mut gl, mut cache, caps) = setup(HeadlessConfig::version_2());
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        let mut textures = TextureManager::new(PotMode::Nearest, true);
        let id = textures
            .create_raw_texture(&mut ctx, Some(&[0; 4]), RawTextureDescriptor::rgba8(1, 1))
            .unwrap();
        let native = textures.native(id).unwrap();
        textures.retain_texture(id).unwrap();
        textures.retain_texture(id).unwrap();
        assert!(!textures.release_texture(&mut ctx, id).unwrap());
        assert!(!textures.release_texture(&mut ctx, id).unwrap());
        assert!(textures.release_texture(&mut ctx, id).unwrap());
        assert!(matches!(
            textures.retain_texture(id),
            Err(ResourceError::Released { .. })
        ));
        assert_eq!(
            gl.count_calls(|c| matches!(c, GlCall::DeleteTexture(t) if *t == native)),
            1
        );
        assert_eq!(textures.allocated_bytes(), 0);
    }

    #[test]
    fn rebuild_restores_retained_and_marks_the_rest_temp() {
        let (mut gl, mut cache, caps) = setup(HeadlessConfig::version_2());
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        let mut textures = TextureManager::new(PotMode::Nearest, true);
        let raw = textures
            .create_raw_texture(&mut ctx, Some(&[1; 16]), RawTextureDescriptor::rgba8(2, 2))
            .unwrap();
        let dynamic = textures
            .create_dynamic_texture(&mut ctx, 2, 2, false, SamplingMode::Bilinear)
            .unwrap();
        textures
            .update_dynamic_texture(&mut ctx, dynamic, &CpuImage::rgba8(2, 2, vec![0; 16]), false, false)
            .unwrap();
        let target = textures
            .create_render_target_texture(&mut ctx, Extent2D::new(16, 16), Default::default())
            .unwrap();

        textures.mark_context_lost();
        assert!(!textures.get(raw).unwrap().is_ready());
        let report = textures.rebuild_all(&mut ctx);
        assert_eq!(report.rebuilt, 2);
        assert_eq!(report.pending, 1);
        assert!(textures.get(raw).unwrap().is_ready());
        assert!(textures.get(target).unwrap().is_ready());
        assert_eq!(textures.get(dynamic).unwrap().source(), TextureSource::Temp);

        textures
            .update_dynamic_texture(&mut ctx, dynamic, &CpuImage::rgba8(2, 2, vec![0; 16]), false, false)
            .unwrap();
        let refilled = textures.get(dynamic).unwrap();
        assert_eq!(refilled.source(), TextureSource::Dynamic);
        assert!(refilled.is_ready());
    }

    #[test]
    fn not_ready_textures_bind_the_empty_texture() {
        let (mut gl, mut cache, caps) = setup(HeadlessConfig::version_2());
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        let mut textures = TextureManager::new(PotMode::Nearest, true);
        let pending = textures
            .create_url_texture(&mut ctx, "slow.png", &TextureLoadOptions::default())
            .unwrap();
        textures.bind_to_unit(&mut ctx, 3, pending);
        let empty = textures.empty_texture(&mut ctx).unwrap();
        assert_eq!(
            ctx.cache.bound_texture(3, TextureBindTarget::Texture2D).known(),
            Some(&textures.native(empty))
        );
    }
}
