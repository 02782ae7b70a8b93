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

//! Context-level descriptors: versions, limits, extensions, and errors.

/// The major version of the native API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ApiVersion {
    /// Version 1 (WebGL 1 / GLES 2 class). Many features are extensions.
    #[default]
    V1,
    /// Version 2 (WebGL 2 / GLES 3 class).
    V2,
}

impl ApiVersion {
    /// The numeric major version.
    pub const fn major(self) -> u32 {
        match self {
            ApiVersion::V1 => 1,
            ApiVersion::V2 => 2,
        }
    }
}

/// Attributes requested when acquiring a native context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextAttributes {
    /// Multisampled default framebuffer.
    pub antialias: bool,
    /// Default framebuffer has a stencil buffer.
    pub stencil: bool,
    /// Keep the drawing buffer between frames.
    pub preserve_drawing_buffer: bool,
    /// Highest version to try; acquisition falls back to lower versions.
    pub max_version: ApiVersion,
}

impl Default for ContextAttributes {
    fn default() -> Self {
        Self {
            antialias: false,
            stencil: true,
            preserve_drawing_buffer: false,
            max_version: ApiVersion::V2,
        }
    }
}

/// A numeric limit queried from the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Limit {
    /// Texture units available to the fragment stage.
    MaxTextureImageUnits,
    /// Texture units across all stages.
    MaxCombinedTextureImageUnits,
    /// Texture units available to the vertex stage.
    MaxVertexTextureImageUnits,
    /// Largest 2D texture dimension.
    MaxTextureSize,
    /// Largest cube map face dimension.
    MaxCubeMapTextureSize,
    /// Largest renderbuffer dimension.
    MaxRenderbufferSize,
    /// Number of vertex attribute slots.
    MaxVertexAttribs,
    /// Multisample count limit (version 2 only).
    MaxSamples,
    /// Largest anisotropy level (requires the anisotropic extension).
    MaxTextureMaxAnisotropy,
    /// Number of color attachments for multiple render targets.
    MaxDrawBuffers,
}

/// Identification strings of the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiString {
    /// GPU vendor.
    Vendor,
    /// GPU renderer.
    Renderer,
    /// API version string.
    Version,
}

/// An optional feature that must be enabled before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extension {
    /// Instanced drawing (core in version 2).
    InstancedArrays,
    /// Vertex array objects (core in version 2).
    VertexArrayObject,
    /// Multiple render targets (core in version 2).
    DrawBuffers,
    /// 32-bit element indices (core in version 2).
    ElementIndexUint,
    /// Derivative functions in fragment shaders (core in version 2).
    StandardDerivatives,
    /// Float textures.
    TextureFloat,
    /// Linear filtering of float textures.
    TextureFloatLinear,
    /// Half-float textures.
    TextureHalfFloat,
    /// Linear filtering of half-float textures.
    TextureHalfFloatLinear,
    /// Rendering into float color buffers.
    ColorBufferFloat,
    /// Rendering into half-float color buffers.
    ColorBufferHalfFloat,
    /// Anisotropic filtering.
    TextureFilterAnisotropic,
    /// Depth textures (core in version 2).
    DepthTexture,
    /// sRGB textures (core in version 2).
    Srgb,
    /// S3TC compressed textures.
    CompressedTextureS3tc,
    /// ETC1 compressed textures.
    CompressedTextureEtc1,
    /// ETC2 compressed textures.
    CompressedTextureEtc,
    /// ASTC compressed textures.
    CompressedTextureAstc,
    /// PVRTC compressed textures.
    CompressedTexturePvrtc,
    /// BPTC compressed textures.
    CompressedTextureBptc,
}

/// A compatibility shim routing core entry points to an extension.
///
/// Once installed, callers invoke the core method on [`GraphicsApi`](crate::renderer::GraphicsApi)
/// regardless of the API version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryPointAlias {
    /// `vertex_attrib_divisor` and the instanced draws go through ANGLE_instanced_arrays.
    InstancedArrays,
    /// Vertex array object calls go through OES_vertex_array_object.
    VertexArrayObject,
    /// `draw_buffers` goes through WEBGL_draw_buffers.
    DrawBuffers,
}

/// The value reported by the context's error query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ApiError {
    /// No error recorded.
    #[default]
    NoError,
    /// An enum argument was out of range.
    InvalidEnum,
    /// A numeric argument was out of range.
    InvalidValue,
    /// The operation is not allowed in the current state.
    InvalidOperation,
    /// The bound framebuffer is incomplete.
    InvalidFramebufferOperation,
    /// Memory exhausted.
    OutOfMemory,
    /// The context is lost.
    ContextLost,
}

/// How the host should treat a context-loss signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LossResponse {
    /// Suppress the default action so the context can be restored.
    PreventDefault,
    /// Let the host discard the context for good.
    Default,
}
