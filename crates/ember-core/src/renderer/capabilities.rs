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

//! The immutable record of what the current context supports.

use crate::ember_bitflags;
use crate::renderer::api::{ApiVersion, CompressedFamily, TextureType};

ember_bitflags! {
    /// Block-compressed format families the context accepts.
    pub struct CompressedFormats: u32 {
        /// S3TC / DXT.
        const S3TC = 1 << 0;
        /// ETC1.
        const ETC1 = 1 << 1;
        /// ETC2 / EAC.
        const ETC2 = 1 << 2;
        /// ASTC.
        const ASTC = 1 << 3;
        /// PVRTC.
        const PVRTC = 1 << 4;
        /// BPTC / BC7.
        const BPTC = 1 << 5;
    }
}

impl CompressedFormats {
    /// The flag for a single family.
    pub const fn from_family(family: CompressedFamily) -> Self {
        match family {
            CompressedFamily::S3tc => Self::S3TC,
            CompressedFamily::Etc1 => Self::ETC1,
            CompressedFamily::Etc2 => Self::ETC2,
            CompressedFamily::Astc => Self::ASTC,
            CompressedFamily::Pvrtc => Self::PVRTC,
            CompressedFamily::Bptc => Self::BPTC,
        }
    }
}

/// Everything the prober learned about the context.
///
/// The record is created when a context is acquired and replaced wholesale
/// after a restore; it is never mutated in between.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Capabilities {
    /// API major version actually in use.
    pub version: ApiVersion,
    /// GPU vendor string.
    pub vendor: String,
    /// GPU renderer string.
    pub renderer: String,

    /// Texture units available to fragment shaders.
    pub max_texture_units: u32,
    /// Texture units across all stages.
    pub max_combined_texture_units: u32,
    /// Texture units available to vertex shaders.
    pub max_vertex_texture_units: u32,
    /// Largest 2D texture dimension.
    pub max_texture_size: u32,
    /// Largest cube map face dimension.
    pub max_cube_map_size: u32,
    /// Largest renderbuffer dimension.
    pub max_render_buffer_size: u32,
    /// Number of vertex attribute slots.
    pub max_vertex_attribs: u32,
    /// MSAA sample limit; 1 when multisampled render targets are unavailable.
    pub max_samples: u32,
    /// Largest anisotropy level; 0 when anisotropic filtering is unavailable.
    pub max_anisotropy: f32,
    /// Number of color attachments for multiple render targets.
    pub max_draw_buffers: u32,

    /// Supported compressed texture families.
    pub compressed_formats: CompressedFormats,

    /// Instanced drawing.
    pub instanced_arrays: bool,
    /// Vertex array objects.
    pub vertex_array_object: bool,
    /// Float textures.
    pub texture_float: bool,
    /// Linear filtering of float textures.
    pub texture_float_linear: bool,
    /// Rendering into float textures.
    pub texture_float_render: bool,
    /// Half-float textures.
    pub texture_half_float: bool,
    /// Linear filtering of half-float textures.
    pub texture_half_float_linear: bool,
    /// Rendering into half-float textures.
    pub texture_half_float_render: bool,
    /// 32-bit element indices.
    pub uint_indices: bool,
    /// Derivative functions in fragment shaders.
    pub standard_derivatives: bool,
    /// Depth textures.
    pub depth_texture: bool,
    /// Multiple render targets.
    pub draw_buffers: bool,
    /// sRGB textures.
    pub srgb: bool,
    /// Both stages support high float precision.
    pub high_precision_shader: bool,
    /// Non-power-of-two textures support mipmaps and repeat wrapping.
    pub npot: bool,
    /// The GPU rescale pass can be used for POT conversion.
    pub hardware_texture_rescaling: bool,
    /// External frames upload directly without a CPU copy.
    pub direct_external_upload: bool,
    /// The platform needs an explicit flush at the end of each frame.
    pub needs_end_frame_flush: bool,
}

impl Capabilities {
    /// Returns `true` if the context accepts the given compressed family.
    pub fn supports_compressed(&self, family: CompressedFamily) -> bool {
        self.compressed_formats
            .contains(CompressedFormats::from_family(family))
    }

    /// Supported compressed families in preference order.
    pub fn preferred_compressed_families(&self) -> Vec<CompressedFamily> {
        [
            CompressedFamily::Astc,
            CompressedFamily::Bptc,
            CompressedFamily::S3tc,
            CompressedFamily::Pvrtc,
            CompressedFamily::Etc2,
            CompressedFamily::Etc1,
        ]
        .into_iter()
        .filter(|family| self.supports_compressed(*family))
        .collect()
    }

    /// Replaces float component types the context cannot store with `UnsignedByte`.
    pub fn supported_texture_type(&self, ty: TextureType) -> TextureType {
        match ty {
            TextureType::Float if !self.texture_float => TextureType::UnsignedByte,
            TextureType::HalfFloat if !self.texture_half_float => TextureType::UnsignedByte,
            other => other,
        }
    }

    /// Returns `true` if textures of this type can be linearly filtered.
    pub fn supports_linear_filtering(&self, ty: TextureType) -> bool {
        match ty {
            TextureType::Float => self.texture_float_linear,
            TextureType::HalfFloat => self.texture_half_float_linear,
            _ => true,
        }
    }

    /// Returns `true` if this type can be rendered into.
    pub fn supports_render_to(&self, ty: TextureType) -> bool {
        match ty {
            TextureType::Float => self.texture_float_render,
            TextureType::HalfFloat => self.texture_half_float_render,
            _ => true,
        }
    }

    /// Returns `true` on version 2 contexts.
    pub fn is_version_2(&self) -> bool {
        self.version == ApiVersion::V2
    }
}
