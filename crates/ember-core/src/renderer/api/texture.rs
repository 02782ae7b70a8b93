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

//! Defines data structures related to textures, samplers, and render targets.

use serde::{Deserialize, Serialize};

/// An opaque handle to a texture managed by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub usize);

/// The binding point of a texture object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureBindTarget {
    /// A two-dimensional texture.
    #[default]
    Texture2D,
    /// A cube map.
    CubeMap,
}

/// One face of a cube map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    /// +X
    PositiveX,
    /// -X
    NegativeX,
    /// +Y
    PositiveY,
    /// -Y
    NegativeY,
    /// +Z
    PositiveZ,
    /// -Z
    NegativeZ,
}

impl CubeFace {
    /// All faces in upload order.
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    /// Returns the face at `index` in upload order.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// The image slot an upload writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TexImageTarget {
    /// The single image of a 2D texture.
    Texture2D,
    /// One face of a cube map.
    CubeFace(CubeFace),
}

impl TexImageTarget {
    /// The bind target owning this image slot.
    pub fn bind_target(self) -> TextureBindTarget {
        match self {
            TexImageTarget::Texture2D => TextureBindTarget::Texture2D,
            TexImageTarget::CubeFace(_) => TextureBindTarget::CubeMap,
        }
    }
}

/// The channel layout of uncompressed texel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    /// A single alpha channel.
    Alpha,
    /// A single luminance channel.
    Luminance,
    /// Luminance and alpha.
    LuminanceAlpha,
    /// A single red channel.
    Red,
    /// Red and green.
    Rg,
    /// Red, green, and blue.
    Rgb,
    /// Red, green, blue, and alpha.
    #[default]
    Rgba,
    /// Depth only.
    Depth,
    /// Packed depth and stencil.
    DepthStencil,
}

impl TextureFormat {
    /// Number of channels per texel.
    pub const fn channels(self) -> usize {
        match self {
            TextureFormat::Alpha
            | TextureFormat::Luminance
            | TextureFormat::Red
            | TextureFormat::Depth
            | TextureFormat::DepthStencil => 1,
            TextureFormat::LuminanceAlpha | TextureFormat::Rg => 2,
            TextureFormat::Rgb => 3,
            TextureFormat::Rgba => 4,
        }
    }

    /// Returns `true` for depth and depth/stencil formats.
    pub const fn is_depth(self) -> bool {
        matches!(self, TextureFormat::Depth | TextureFormat::DepthStencil)
    }
}

/// The component type of uncompressed texel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureType {
    /// 8-bit unsigned normalized.
    #[default]
    UnsignedByte,
    /// 32-bit float.
    Float,
    /// 16-bit float.
    HalfFloat,
    /// 32-bit unsigned integer, used by depth textures.
    UnsignedInt,
    /// Packed 24-bit depth and 8-bit stencil.
    UnsignedInt24_8,
}

impl TextureType {
    /// Size in bytes of a single channel (or of the packed word).
    pub const fn bytes_per_channel(self) -> usize {
        match self {
            TextureType::UnsignedByte => 1,
            TextureType::HalfFloat => 2,
            TextureType::Float | TextureType::UnsignedInt | TextureType::UnsignedInt24_8 => 4,
        }
    }
}

/// Size in bytes of an uncompressed image.
pub fn image_byte_size(width: u32, height: u32, format: TextureFormat, ty: TextureType) -> usize {
    width as usize * height as usize * format.channels() * ty.bytes_per_channel()
}

/// Families of block-compressed formats, probed as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressedFamily {
    /// S3TC / DXT.
    S3tc,
    /// ETC1.
    Etc1,
    /// ETC2 / EAC.
    Etc2,
    /// ASTC.
    Astc,
    /// PVRTC.
    Pvrtc,
    /// BPTC / BC7.
    Bptc,
}

impl CompressedFamily {
    /// The URL suffix used to select a pre-compressed variant of an asset.
    pub const fn variant_suffix(self) -> &'static str {
        match self {
            CompressedFamily::S3tc => "-dxt.ktx",
            CompressedFamily::Etc1 => "-etc1.ktx",
            CompressedFamily::Etc2 => "-etc2.ktx",
            CompressedFamily::Astc => "-astc.ktx",
            CompressedFamily::Pvrtc => "-pvrtc.ktx",
            CompressedFamily::Bptc => "-bptc.ktx",
        }
    }
}

/// A block-compressed texel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressedFormat {
    /// DXT1 without alpha.
    RgbS3tcDxt1,
    /// DXT1 with 1-bit alpha.
    RgbaS3tcDxt1,
    /// DXT3.
    RgbaS3tcDxt3,
    /// DXT5.
    RgbaS3tcDxt5,
    /// ETC1.
    RgbEtc1,
    /// ETC2 RGB.
    Rgb8Etc2,
    /// ETC2 RGBA with EAC alpha.
    Rgba8Etc2Eac,
    /// ASTC with 4x4 blocks.
    RgbaAstc4x4,
    /// PVRTC 4bpp without alpha.
    RgbPvrtc4bpp,
    /// PVRTC 4bpp with alpha.
    RgbaPvrtc4bpp,
    /// BC7.
    RgbaBptcUnorm,
}

impl CompressedFormat {
    /// Maps a GL internal format enum (as stored in KTX headers).
    pub fn from_gl_internal_format(value: u32) -> Option<Self> {
        Some(match value {
            0x83F0 => CompressedFormat::RgbS3tcDxt1,
            0x83F1 => CompressedFormat::RgbaS3tcDxt1,
            0x83F2 => CompressedFormat::RgbaS3tcDxt3,
            0x83F3 => CompressedFormat::RgbaS3tcDxt5,
            0x8D64 => CompressedFormat::RgbEtc1,
            0x9274 => CompressedFormat::Rgb8Etc2,
            0x9278 => CompressedFormat::Rgba8Etc2Eac,
            0x93B0 => CompressedFormat::RgbaAstc4x4,
            0x8C00 => CompressedFormat::RgbPvrtc4bpp,
            0x8C02 => CompressedFormat::RgbaPvrtc4bpp,
            0x8E8C => CompressedFormat::RgbaBptcUnorm,
            _ => return None,
        })
    }

    /// The family this format belongs to.
    pub const fn family(self) -> CompressedFamily {
        match self {
            CompressedFormat::RgbS3tcDxt1
            | CompressedFormat::RgbaS3tcDxt1
            | CompressedFormat::RgbaS3tcDxt3
            | CompressedFormat::RgbaS3tcDxt5 => CompressedFamily::S3tc,
            CompressedFormat::RgbEtc1 => CompressedFamily::Etc1,
            CompressedFormat::Rgb8Etc2 | CompressedFormat::Rgba8Etc2Eac => CompressedFamily::Etc2,
            CompressedFormat::RgbaAstc4x4 => CompressedFamily::Astc,
            CompressedFormat::RgbPvrtc4bpp | CompressedFormat::RgbaPvrtc4bpp => {
                CompressedFamily::Pvrtc
            }
            CompressedFormat::RgbaBptcUnorm => CompressedFamily::Bptc,
        }
    }
}

/// Magnification filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MagFilter {
    /// Nearest texel.
    Nearest,
    /// Bilinear interpolation.
    Linear,
}

/// Minification filter, optionally sampling between mip levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MinFilter {
    /// Nearest texel, no mips.
    Nearest,
    /// Bilinear, no mips.
    Linear,
    /// Nearest texel in the nearest mip.
    NearestMipmapNearest,
    /// Bilinear in the nearest mip.
    LinearMipmapNearest,
    /// Nearest texel, blended between mips.
    NearestMipmapLinear,
    /// Bilinear, blended between mips.
    LinearMipmapLinear,
}

/// The filtering applied when sampling a texture.
///
/// Variants are named `Mag_Min_Mip`. The three classic modes are aliases:
/// `Nearest` (nearest, nearest, linear mip), `Bilinear` (linear, linear,
/// nearest mip), and `Trilinear` (linear, linear, linear mip).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SamplingMode {
    /// Nearest mag/min, linear mip blend.
    Nearest,
    /// Linear mag/min, nearest mip.
    Bilinear,
    /// Linear mag/min, linear mip blend.
    #[default]
    Trilinear,
    /// Nearest mag, nearest min, nearest mip.
    NearestNearestMipNearest,
    /// Nearest mag, linear min, nearest mip.
    NearestLinearMipNearest,
    /// Nearest mag, linear min, linear mip.
    NearestLinearMipLinear,
    /// Nearest mag, linear min, no mips.
    NearestLinear,
    /// Nearest mag, nearest min, no mips.
    NearestNearest,
    /// Linear mag, nearest min, nearest mip.
    LinearNearestMipNearest,
    /// Linear mag, nearest min, linear mip.
    LinearNearestMipLinear,
    /// Linear mag, linear min, no mips.
    LinearLinear,
    /// Linear mag, nearest min, no mips.
    LinearNearest,
}

/// The concrete filter pair for a sampling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterPair {
    /// Minification filter.
    pub min: MinFilter,
    /// Magnification filter.
    pub mag: MagFilter,
}

impl SamplingMode {
    /// Resolves the min/mag filters. Mip variants collapse to their base
    /// filter when the texture has no mip chain.
    pub fn filters(self, has_mipmaps: bool) -> FilterPair {
        use MagFilter as Mag;
        use MinFilter as Min;
        let pick = |with_mips: Min, without: Min| if has_mipmaps { with_mips } else { without };
        let (mag, min) = match self {
            SamplingMode::Bilinear => (Mag::Linear, pick(Min::LinearMipmapNearest, Min::Linear)),
            SamplingMode::Trilinear => (Mag::Linear, pick(Min::LinearMipmapLinear, Min::Linear)),
            SamplingMode::Nearest => (Mag::Nearest, pick(Min::NearestMipmapLinear, Min::Nearest)),
            SamplingMode::NearestNearestMipNearest => {
                (Mag::Nearest, pick(Min::NearestMipmapNearest, Min::Nearest))
            }
            SamplingMode::NearestLinearMipNearest => {
                (Mag::Nearest, pick(Min::LinearMipmapNearest, Min::Linear))
            }
            SamplingMode::NearestLinearMipLinear => {
                (Mag::Nearest, pick(Min::LinearMipmapLinear, Min::Linear))
            }
            SamplingMode::NearestLinear => (Mag::Nearest, Min::Linear),
            SamplingMode::NearestNearest => (Mag::Nearest, Min::Nearest),
            SamplingMode::LinearNearestMipNearest => {
                (Mag::Linear, pick(Min::NearestMipmapNearest, Min::Nearest))
            }
            SamplingMode::LinearNearestMipLinear => {
                (Mag::Linear, pick(Min::NearestMipmapLinear, Min::Nearest))
            }
            SamplingMode::LinearLinear => (Mag::Linear, Min::Linear),
            SamplingMode::LinearNearest => (Mag::Linear, Min::Nearest),
        };
        FilterPair { min, mag }
    }
}

/// Texture coordinate wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WrapMode {
    /// Tile the texture.
    #[default]
    Repeat,
    /// Clamp to the edge texel.
    Clamp,
    /// Tile, mirroring every other repetition.
    Mirror,
}

/// How a non-power-of-two size is rounded when the device requires POT textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PotMode {
    /// Round to the closest power of two.
    #[default]
    Nearest,
    /// Round down.
    Floor,
    /// Round up.
    Ceiling,
}

/// A sampler parameter applied to the bound texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TexParameter {
    /// Minification filter.
    MinFilter(MinFilter),
    /// Magnification filter.
    MagFilter(MagFilter),
    /// Wrapping along U.
    WrapS(WrapMode),
    /// Wrapping along V.
    WrapT(WrapMode),
    /// Wrapping along W (cube maps, version 2 only).
    WrapR(WrapMode),
    /// Anisotropic filtering level.
    MaxAnisotropy(f32),
}

/// Pixel unpack parameters applied to subsequent uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelStore {
    /// Flip rows vertically during upload.
    UnpackFlipY(bool),
    /// Multiply color channels by alpha during upload.
    UnpackPremultiplyAlpha(bool),
    /// Row alignment in bytes.
    UnpackAlignment(u32),
}

/// Where a texture's content comes from, which decides how it is rebuilt
/// after a context loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSource {
    /// Fetched from a URL or data URI.
    Url,
    /// Uploaded from caller-provided bytes.
    Raw,
    /// Refreshed by the caller (dynamic canvas or video).
    Dynamic,
    /// Color attachment of a render target.
    RenderTarget,
    /// Depth/stencil attachment.
    DepthStencil,
    /// Content could not be rebuilt; waiting for the owner to refill it.
    Temp,
}

/// An uncompressed decoded image.
#[derive(Debug, Clone, PartialEq)]
pub struct CpuImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Channel layout.
    pub format: TextureFormat,
    /// Component type.
    pub ty: TextureType,
    /// Tightly packed rows, top row first.
    pub pixels: Vec<u8>,
}

impl CpuImage {
    /// Creates an 8-bit RGBA image.
    pub fn rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format: TextureFormat::Rgba,
            ty: TextureType::UnsignedByte,
            pixels,
        }
    }
}

/// A block-compressed image with its full mip chain.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedImage {
    /// Block format.
    pub format: CompressedFormat,
    /// Width of level 0.
    pub width: u32,
    /// Height of level 0.
    pub height: u32,
    /// One payload per mip level, level 0 first.
    pub levels: Vec<Vec<u8>>,
}

/// The output of a texture loader.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedTexture {
    /// Uncompressed pixels, uploaded with POT handling.
    Pixels(CpuImage),
    /// Pre-compressed data, uploaded as-is.
    Compressed(CompressedImage),
}

impl DecodedTexture {
    /// Dimensions of the base level.
    pub fn size(&self) -> (u32, u32) {
        match self {
            DecodedTexture::Pixels(img) => (img.width, img.height),
            DecodedTexture::Compressed(img) => (img.width, img.height),
        }
    }
}

/// A frame from an external image source such as a video element.
///
/// Backends that support direct upload consume the frame as-is; otherwise the
/// device copies `pixels` through the regular upload path.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalFrame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// RGBA8 pixels.
    pub pixels: Vec<u8>,
}

/// The binding point of a framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramebufferTarget {
    /// Read and draw.
    Framebuffer,
    /// Read only (blit source).
    Read,
    /// Draw only (blit destination).
    Draw,
}

/// A framebuffer attachment point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attachment {
    /// First color attachment.
    Color0,
    /// Depth.
    Depth,
    /// Stencil.
    Stencil,
    /// Packed depth/stencil.
    DepthStencil,
}

/// Storage format of a renderbuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderbufferFormat {
    /// 16-bit depth.
    Depth16,
    /// Stencil only.
    Stencil8,
    /// Packed depth/stencil.
    Depth24Stencil8,
    /// Color.
    Rgba8,
}

/// Filter used when resolving a blit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlitFilter {
    /// Nearest texel.
    Nearest,
    /// Bilinear.
    Linear,
}

/// Options for creating a render-target texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTargetOptions {
    /// Allocate and regenerate a mip chain after each pass.
    pub generate_mipmaps: bool,
    /// Attach a depth renderbuffer.
    pub generate_depth_buffer: bool,
    /// Attach a stencil renderbuffer (packed with depth when both are set).
    pub generate_stencil_buffer: bool,
    /// MSAA sample count; 1 disables multisampling.
    pub samples: u32,
    /// Color format.
    pub format: TextureFormat,
    /// Color component type.
    pub ty: TextureType,
    /// Sampling applied to the color texture.
    pub sampling_mode: SamplingMode,
    /// Create a cube render target.
    pub is_cube: bool,
}

impl Default for RenderTargetOptions {
    fn default() -> Self {
        Self {
            generate_mipmaps: false,
            generate_depth_buffer: true,
            generate_stencil_buffer: false,
            samples: 1,
            format: TextureFormat::Rgba,
            ty: TextureType::UnsignedByte,
            sampling_mode: SamplingMode::Trilinear,
            is_cube: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classic_modes_map_to_expected_filters() {
        let tri = SamplingMode::Trilinear.filters(true);
        assert_eq!(tri.min, MinFilter::LinearMipmapLinear);
        assert_eq!(tri.mag, MagFilter::Linear);

        let bi = SamplingMode::Bilinear.filters(true);
        assert_eq!(bi.min, MinFilter::LinearMipmapNearest);

        let near = SamplingMode::Nearest.filters(true);
        assert_eq!(near.min, MinFilter::NearestMipmapLinear);
        assert_eq!(near.mag, MagFilter::Nearest);
    }

    #[test]
    fn mip_variants_collapse_without_mips() {
        assert_eq!(SamplingMode::Trilinear.filters(false).min, MinFilter::Linear);
        assert_eq!(
            SamplingMode::LinearNearestMipLinear.filters(false),
            FilterPair {
                min: MinFilter::Nearest,
                mag: MagFilter::Linear
            }
        );
    }

    #[test]
    fn ktx_internal_formats_resolve_to_families() {
        let fmt = CompressedFormat::from_gl_internal_format(0x83F3).unwrap();
        assert_eq!(fmt, CompressedFormat::RgbaS3tcDxt5);
        assert_eq!(fmt.family(), CompressedFamily::S3tc);
        assert!(CompressedFormat::from_gl_internal_format(0x1234).is_none());
    }

    #[test]
    fn byte_size_accounts_for_type() {
        assert_eq!(
            image_byte_size(4, 4, TextureFormat::Rgba, TextureType::UnsignedByte),
            64
        );
        assert_eq!(
            image_byte_size(4, 4, TextureFormat::Rgb, TextureType::Float),
            192
        );
    }

    #[test]
    fn cube_faces_round_trip_by_index() {
        assert_eq!(CubeFace::from_index(4), Some(CubeFace::PositiveZ));
        assert_eq!(CubeFace::from_index(6), None);
    }
}
