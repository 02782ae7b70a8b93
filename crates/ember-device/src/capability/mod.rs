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

//! Queries a freshly acquired context once and produces its [`Capabilities`].
//!
//! Probing never fails: an extension that cannot be enabled simply leaves its
//! flag off. On version-1 contexts the prober also installs the entry-point
//! aliases so that callers use the core methods regardless of version.

use ember_core::renderer::{
    ApiError, ApiString, ApiVersion, Capabilities, CompressedFormats, EntryPointAlias,
    ExternalFrame, Extension, GraphicsApi, Limit, ShaderStage, TexImageTarget, TextureBindTarget,
};
use ember_core::EngineOptions;

/// Options that influence probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProbeOptions {
    /// Treat a version-2 context as version 1.
    pub force_version_1: bool,
}

impl From<&EngineOptions> for ProbeOptions {
    fn from(options: &EngineOptions) -> Self {
        Self {
            force_version_1: options.disable_webgl2_support,
        }
    }
}

/// Probes `api` and returns its capability record.
pub fn probe(api: &mut dyn GraphicsApi, options: ProbeOptions) -> Capabilities {
    let version = if options.force_version_1 {
        ApiVersion::V1
    } else {
        api.api_version()
    };
    let v2 = version == ApiVersion::V2;

    let mut caps = Capabilities {
        version,
        vendor: api.get_string(ApiString::Vendor),
        renderer: api.get_string(ApiString::Renderer),
        max_texture_units: api.get_limit(Limit::MaxTextureImageUnits),
        max_combined_texture_units: api.get_limit(Limit::MaxCombinedTextureImageUnits),
        max_vertex_texture_units: api.get_limit(Limit::MaxVertexTextureImageUnits),
        max_texture_size: api.get_limit(Limit::MaxTextureSize),
        max_cube_map_size: api.get_limit(Limit::MaxCubeMapTextureSize),
        max_render_buffer_size: api.get_limit(Limit::MaxRenderbufferSize),
        max_vertex_attribs: api.get_limit(Limit::MaxVertexAttribs),
        max_samples: if v2 {
            api.get_limit(Limit::MaxSamples).max(1)
        } else {
            1
        },
        ..Default::default()
    };

    caps.high_precision_shader = api.high_float_precision(ShaderStage::Vertex)
        && api.high_float_precision(ShaderStage::Fragment);

    // Features that are core in version 2 and extensions in version 1.
    caps.standard_derivatives = v2 || api.enable_extension(Extension::StandardDerivatives);
    caps.uint_indices = v2 || api.enable_extension(Extension::ElementIndexUint);
    caps.depth_texture = v2 || api.enable_extension(Extension::DepthTexture);
    caps.srgb = v2 || api.enable_extension(Extension::Srgb);
    caps.instanced_arrays = v2
        || (api.enable_extension(Extension::InstancedArrays)
            && api.alias_entry_point(EntryPointAlias::InstancedArrays));
    caps.vertex_array_object = v2
        || (api.enable_extension(Extension::VertexArrayObject)
            && api.alias_entry_point(EntryPointAlias::VertexArrayObject));
    caps.draw_buffers = v2
        || (api.enable_extension(Extension::DrawBuffers)
            && api.alias_entry_point(EntryPointAlias::DrawBuffers));
    caps.max_draw_buffers = if caps.draw_buffers {
        api.get_limit(Limit::MaxDrawBuffers).max(1)
    } else {
        1
    };

    caps.texture_float = v2 || api.enable_extension(Extension::TextureFloat);
    caps.texture_float_linear =
        caps.texture_float && api.enable_extension(Extension::TextureFloatLinear);
    caps.texture_float_render =
        caps.texture_float && api.enable_extension(Extension::ColorBufferFloat);
    caps.texture_half_float = v2 || api.enable_extension(Extension::TextureHalfFloat);
    caps.texture_half_float_linear = caps.texture_half_float
        && (v2 || api.enable_extension(Extension::TextureHalfFloatLinear));
    caps.texture_half_float_render = caps.texture_half_float
        && (caps.texture_float_render || api.enable_extension(Extension::ColorBufferHalfFloat));

    if api.enable_extension(Extension::TextureFilterAnisotropic) {
        caps.max_anisotropy = api.get_limit(Limit::MaxTextureMaxAnisotropy) as f32;
    }

    let mut compressed = CompressedFormats::EMPTY;
    for (extension, flag) in [
        (Extension::CompressedTextureS3tc, CompressedFormats::S3TC),
        (Extension::CompressedTextureEtc1, CompressedFormats::ETC1),
        (Extension::CompressedTextureEtc, CompressedFormats::ETC2),
        (Extension::CompressedTextureAstc, CompressedFormats::ASTC),
        (Extension::CompressedTexturePvrtc, CompressedFormats::PVRTC),
        (Extension::CompressedTextureBptc, CompressedFormats::BPTC),
    ] {
        compressed.set(flag, api.enable_extension(extension));
    }
    caps.compressed_formats = compressed;

    caps.npot = v2;
    caps.hardware_texture_rescaling = probe_framebuffer_support(api);
    caps.needs_end_frame_flush = caps.renderer.contains("Apple");
    caps.direct_external_upload = probe_external_upload(api);

    // Errors raised by rejected probes must not be blamed on later calls.
    drain_errors(api);

    log::info!(
        "Probed {} context: {} / {} (max texture {}, instancing {}, VAO {}, npot {})",
        if v2 { "version 2" } else { "version 1" },
        caps.vendor,
        caps.renderer,
        caps.max_texture_size,
        caps.instanced_arrays,
        caps.vertex_array_object,
        caps.npot,
    );
    caps
}

/// Clears the error queue. Bounded, since a lost context may report its loss
/// on every query.
pub(crate) fn drain_errors(api: &mut dyn GraphicsApi) {
    for _ in 0..16 {
        if api.get_error() == ApiError::NoError {
            break;
        }
    }
}

fn probe_framebuffer_support(api: &mut dyn GraphicsApi) -> bool {
    match api.create_framebuffer() {
        Some(framebuffer) => {
            api.delete_framebuffer(framebuffer);
            true
        }
        None => false,
    }
}

/// Checks once whether external frames can be uploaded directly.
///
/// Uploads a 1x1 frame into a scratch texture and inspects the error flag.
/// The scratch texture is bound on the active unit without going through the
/// state cache, so this must only run before the cache is trusted (right
/// after acquisition, before the cache wipe).
pub fn probe_external_upload(api: &mut dyn GraphicsApi) -> bool {
    let Some(texture) = api.create_texture() else {
        return false;
    };
    drain_errors(api);

    api.bind_texture(TextureBindTarget::Texture2D, Some(texture));
    let frame = ExternalFrame {
        width: 1,
        height: 1,
        pixels: vec![0, 0, 0, 255],
    };
    api.tex_image_external(TexImageTarget::Texture2D, &frame);
    let supported = api.get_error() == ApiError::NoError;
    api.bind_texture(TextureBindTarget::Texture2D, None);
    api.delete_texture(texture);

    log::debug!("Direct external upload supported: {supported}");
    supported
}
