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

use ember_core::renderer::{ApiVersion, EntryPointAlias, Extension};
use std::collections::HashSet;

const ALL_EXTENSIONS: [Extension; 20] = [
    Extension::InstancedArrays,
    Extension::VertexArrayObject,
    Extension::DrawBuffers,
    Extension::ElementIndexUint,
    Extension::StandardDerivatives,
    Extension::TextureFloat,
    Extension::TextureFloatLinear,
    Extension::TextureHalfFloat,
    Extension::TextureHalfFloatLinear,
    Extension::ColorBufferFloat,
    Extension::ColorBufferHalfFloat,
    Extension::TextureFilterAnisotropic,
    Extension::DepthTexture,
    Extension::Srgb,
    Extension::CompressedTextureS3tc,
    Extension::CompressedTextureEtc1,
    Extension::CompressedTextureEtc,
    Extension::CompressedTextureAstc,
    Extension::CompressedTexturePvrtc,
    Extension::CompressedTextureBptc,
];

/// Describes the context a [`HeadlessGl`](super::HeadlessGl) pretends to be.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessConfig {
    /// Reported API version.
    pub version: ApiVersion,
    /// Reported vendor string.
    pub vendor: String,
    /// Reported renderer string.
    pub renderer: String,
    /// Extensions that can be enabled.
    pub extensions: HashSet<Extension>,
    /// Fragment texture units.
    pub max_texture_units: u32,
    /// Combined texture units.
    pub max_combined_texture_units: u32,
    /// Vertex texture units.
    pub max_vertex_texture_units: u32,
    /// Largest texture dimension.
    pub max_texture_size: u32,
    /// Largest cube face dimension.
    pub max_cube_map_size: u32,
    /// Largest renderbuffer dimension.
    pub max_render_buffer_size: u32,
    /// Vertex attribute slots.
    pub max_vertex_attribs: u32,
    /// MSAA sample limit (version 2 only).
    pub max_samples: u32,
    /// Anisotropy limit.
    pub max_anisotropy: u32,
    /// Color attachment limit.
    pub max_draw_buffers: u32,
    /// Both shader stages support `highp`.
    pub high_precision: bool,
    /// External frames can be uploaded directly.
    pub direct_external_upload: bool,
}

impl HeadlessConfig {
    /// A version-2 context with every extension.
    pub fn version_2() -> Self {
        Self {
            version: ApiVersion::V2,
            vendor: "Ember".to_string(),
            renderer: "Ember Headless".to_string(),
            extensions: ALL_EXTENSIONS.into_iter().collect(),
            max_texture_units: 16,
            max_combined_texture_units: 32,
            max_vertex_texture_units: 16,
            max_texture_size: 4096,
            max_cube_map_size: 4096,
            max_render_buffer_size: 4096,
            max_vertex_attribs: 16,
            max_samples: 4,
            max_anisotropy: 16,
            max_draw_buffers: 8,
            high_precision: true,
            direct_external_upload: true,
        }
    }

    /// A version-1 context with every extension.
    pub fn version_1() -> Self {
        Self {
            version: ApiVersion::V1,
            max_samples: 0,
            ..Self::version_2()
        }
    }

    /// Removes every extension.
    pub fn without_all_extensions(mut self) -> Self {
        self.extensions.clear();
        self
    }

    /// Makes `extension` available.
    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.extensions.insert(extension);
        self
    }

    /// Removes `extension`.
    pub fn without_extension(mut self, extension: Extension) -> Self {
        self.extensions.remove(&extension);
        self
    }

    /// Sets the renderer string.
    pub fn with_renderer(mut self, renderer: impl Into<String>) -> Self {
        self.renderer = renderer.into();
        self
    }

    /// Sets the largest texture dimension.
    pub fn with_max_texture_size(mut self, size: u32) -> Self {
        self.max_texture_size = size;
        self.max_cube_map_size = size;
        self
    }

    /// Sets whether external frames can be uploaded directly.
    pub fn with_direct_external_upload(mut self, supported: bool) -> Self {
        self.direct_external_upload = supported;
        self
    }

    /// Sets whether shaders support `highp`.
    pub fn with_high_precision(mut self, supported: bool) -> Self {
        self.high_precision = supported;
        self
    }

    /// The extension an entry-point alias routes through.
    pub(crate) fn alias_extension(alias: EntryPointAlias) -> Extension {
        match alias {
            EntryPointAlias::InstancedArrays => Extension::InstancedArrays,
            EntryPointAlias::VertexArrayObject => Extension::VertexArrayObject,
            EntryPointAlias::DrawBuffers => Extension::DrawBuffers,
        }
    }
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self::version_2()
    }
}
