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

//! Loader for KTX (version 1) containers of block-compressed textures.

use ember_core::renderer::{
    Capabilities, CompressedFormat, CompressedImage, DecodeError, DecodedTexture, TextureLoader,
};

const IDENTIFIER: [u8; 12] = [
    0xAB, 0x4B, 0x54, 0x58, 0x20, 0x31, 0x31, 0xBB, 0x0D, 0x0A, 0x1A, 0x0A,
];
const HEADER_LEN: usize = 64;
const ENDIANNESS: u32 = 0x0403_0201;

/// Returns `true` if `data` starts with the KTX identifier.
pub fn is_ktx(data: &[u8]) -> bool {
    data.len() >= IDENTIFIER.len() && data[..IDENTIFIER.len()] == IDENTIFIER
}

struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
    big_endian: bool,
}

impl Reader<'_> {
    fn u32(&mut self) -> Result<u32, DecodeError> {
        let bytes: [u8; 4] = self
            .data
            .get(self.offset..self.offset + 4)
            .and_then(|b| b.try_into().ok())
            .ok_or("truncated KTX data")?;
        self.offset += 4;
        Ok(if self.big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        })
    }

    fn bytes(&mut self, len: usize) -> Result<&[u8], DecodeError> {
        let slice = self
            .data
            .get(self.offset..self.offset + len)
            .ok_or("truncated KTX image data")?;
        self.offset += len;
        Ok(slice)
    }
}

/// Parses a 2D KTX container holding compressed data.
pub fn parse_ktx(data: &[u8]) -> Result<CompressedImage, DecodeError> {
    if !is_ktx(data) {
        return Err("missing KTX identifier".into());
    }
    if data.len() < HEADER_LEN {
        return Err("truncated KTX header".into());
    }
    let mut reader = Reader {
        data,
        offset: IDENTIFIER.len(),
        big_endian: false,
    };
    match reader.u32()? {
        ENDIANNESS => {}
        other if other.swap_bytes() == ENDIANNESS => reader.big_endian = true,
        other => return Err(format!("invalid KTX endianness marker {other:#010x}").into()),
    }

    let gl_type = reader.u32()?;
    let _gl_type_size = reader.u32()?;
    let _gl_format = reader.u32()?;
    let internal_format = reader.u32()?;
    let _base_internal_format = reader.u32()?;
    let width = reader.u32()?;
    let height = reader.u32()?;
    let depth = reader.u32()?;
    let array_elements = reader.u32()?;
    let faces = reader.u32()?;
    let levels = reader.u32()?.max(1);
    let key_value_bytes = reader.u32()? as usize;

    if gl_type != 0 {
        return Err("only compressed KTX files are supported".into());
    }
    if depth > 0 || array_elements > 0 || faces != 1 {
        return Err("only 2D KTX textures are supported".into());
    }
    let format = CompressedFormat::from_gl_internal_format(internal_format)
        .ok_or_else(|| format!("unknown compressed format {internal_format:#06x}"))?;

    reader.bytes(key_value_bytes)?;
    let mut payloads = Vec::with_capacity(levels as usize);
    for _ in 0..levels {
        let size = reader.u32()? as usize;
        payloads.push(reader.bytes(size)?.to_vec());
        let padding = (4 - size % 4) % 4;
        reader.offset += padding;
    }

    Ok(CompressedImage {
        format,
        width,
        height,
        levels: payloads,
    })
}

/// Decodes `.ktx` files.
///
/// With variant selection enabled the loader also claims other image
/// requests on contexts with compressed texture support, fetching the
/// `-<family>.ktx` variant of the asset instead. The original URL is offered
/// as the fallback.
#[derive(Debug, Default, Clone)]
pub struct KtxLoader {
    select_variants: bool,
}

impl KtxLoader {
    /// A loader for explicit `.ktx` URLs.
    pub fn new() -> Self {
        Self::default()
    }

    /// A loader that also redirects other images to compressed variants.
    pub fn with_variant_selection() -> Self {
        Self {
            select_variants: true,
        }
    }

    fn redirects(&self, url: &str, caps: &Capabilities) -> bool {
        self.select_variants
            && !url.to_ascii_lowercase().ends_with(".ktx")
            && !caps.preferred_compressed_families().is_empty()
    }
}

impl TextureLoader for KtxLoader {
    fn name(&self) -> &str {
        "ktx"
    }

    fn can_load(&self, extension: &str, data: Option<&[u8]>, caps: &Capabilities) -> bool {
        if extension == ".ktx" {
            return true;
        }
        match data {
            Some(bytes) => is_ktx(bytes),
            None => {
                self.select_variants
                    && !extension.is_empty()
                    && !caps.preferred_compressed_families().is_empty()
            }
        }
    }

    fn transform_url(&self, url: &str, caps: &Capabilities) -> String {
        if !self.redirects(url, caps) {
            return url.to_string();
        }
        let Some(family) = caps.preferred_compressed_families().first().copied() else {
            return url.to_string();
        };
        let stem = match url.rfind('.') {
            Some(dot) if !url[dot..].contains('/') => &url[..dot],
            _ => url,
        };
        format!("{stem}{}", family.variant_suffix())
    }

    fn fallback_texture_url(&self, url: &str, caps: &Capabilities) -> Option<String> {
        self.redirects(url, caps).then(|| url.to_string())
    }

    fn load_data(&self, data: &[u8], caps: &Capabilities) -> Result<DecodedTexture, DecodeError> {
        let image = parse_ktx(data)?;
        if !caps.supports_compressed(image.format.family()) {
            return Err(format!("{:?} textures are not supported by this context", image.format).into());
        }
        Ok(DecodedTexture::Compressed(image))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ember_core::renderer::{CompressedFamily, CompressedFormats};

    /// Builds a little-endian KTX file with the given level payloads.
    pub(crate) fn ktx_bytes(internal_format: u32, width: u32, height: u32, levels: &[Vec<u8>]) -> Vec<u8> {
        let mut out = IDENTIFIER.to_vec();
        let header = [
            ENDIANNESS,
            0,
            1,
            0,
            internal_format,
            0x1908,
            width,
            height,
            0,
            0,
            1,
            levels.len() as u32,
            4,
        ];
        for value in header {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out.extend_from_slice(&[0; 4]);
        for level in levels {
            out.extend_from_slice(&(level.len() as u32).to_le_bytes());
            out.extend_from_slice(level);
            out.extend(std::iter::repeat(0).take((4 - level.len() % 4) % 4));
        }
        out
    }

    fn s3tc_caps() -> Capabilities {
        Capabilities {
            compressed_formats: CompressedFormats::S3TC,
            ..Default::default()
        }
    }

    #[test]
    fn parses_levels() {
        let data = ktx_bytes(0x83F3, 8, 8, &[vec![1; 64], vec![2; 16]]);
        let image = parse_ktx(&data).unwrap();
        assert_eq!(image.format, CompressedFormat::RgbaS3tcDxt5);
        assert_eq!((image.width, image.height), (8, 8));
        assert_eq!(image.levels.len(), 2);
        assert_eq!(image.levels[1], vec![2; 16]);
    }

    #[test]
    fn rejects_truncated_and_foreign_data() {
        let data = ktx_bytes(0x83F3, 8, 8, &[vec![1; 64]]);
        assert!(parse_ktx(&data[..70]).is_err());
        assert!(parse_ktx(b"\x89PNG\r\n\x1a\n").is_err());
        let unknown = ktx_bytes(0x1234, 8, 8, &[vec![1; 64]]);
        assert!(parse_ktx(&unknown).is_err());
    }

    #[test]
    fn detects_by_extension_and_content() {
        let loader = KtxLoader::new();
        let caps = s3tc_caps();
        assert!(loader.can_load(".ktx", None, &caps));
        assert!(!loader.can_load(".png", None, &caps));
        let data = ktx_bytes(0x83F3, 4, 4, &[vec![0; 16]]);
        assert!(loader.can_load("", Some(&data), &caps));
    }

    #[test]
    fn variant_selection_rewrites_urls() {
        let loader = KtxLoader::with_variant_selection();
        let caps = s3tc_caps();
        assert!(loader.can_load(".png", None, &caps));
        assert_eq!(loader.transform_url("textures/wood.png", &caps), "textures/wood-dxt.ktx");
        assert_eq!(
            loader.fallback_texture_url("textures/wood.png", &caps),
            Some("textures/wood.png".to_string())
        );
        assert_eq!(loader.transform_url("a.ktx", &caps), "a.ktx");

        let plain = Capabilities::default();
        assert!(!loader.can_load(".png", None, &plain));
        assert_eq!(loader.transform_url("wood.png", &plain), "wood.png");
        assert_eq!(CompressedFamily::S3tc.variant_suffix(), "-dxt.ktx");
    }

    #[test]
    fn unsupported_family_fails_to_decode() {
        let data = ktx_bytes(0x8D64, 4, 4, &[vec![0; 8]]);
        assert!(KtxLoader::new().load_data(&data, &s3tc_caps()).is_err());
    }
}
