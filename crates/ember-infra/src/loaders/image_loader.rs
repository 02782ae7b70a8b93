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

//! Decoding of common image files.

use anyhow::Context;
use ember_core::renderer::{Capabilities, CpuImage, DecodeError, DecodedTexture, TextureLoader};
use image::ImageFormat;

const EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg"];

/// The default image decoder: PNG and JPEG into tightly packed RGBA8.
///
/// Claims requests by extension before fetching and by sniffing the header
/// afterwards, so extension-less URLs still decode.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageLoader;

impl ImageLoader {
    /// Creates the loader.
    pub fn new() -> Self {
        Self
    }

    fn sniff(data: &[u8]) -> Option<ImageFormat> {
        image::guess_format(data)
            .ok()
            .filter(|format| matches!(format, ImageFormat::Png | ImageFormat::Jpeg))
    }
}

impl TextureLoader for ImageLoader {
    fn name(&self) -> &str {
        "image"
    }

    fn can_load(&self, extension: &str, data: Option<&[u8]>, _caps: &Capabilities) -> bool {
        match data {
            Some(bytes) => Self::sniff(bytes).is_some(),
            None => extension.is_empty() || EXTENSIONS.contains(&extension),
        }
    }

    fn load_data(&self, data: &[u8], _caps: &Capabilities) -> Result<DecodedTexture, DecodeError> {
        let format = Self::sniff(data).context("Unrecognized image header")?;
        let decoded = image::load_from_memory_with_format(data, format)
            .with_context(|| format!("Failed to decode {format:?} image"))?;

        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        log::trace!("Decoded {format:?} image {width}x{height}");
        Ok(DecodedTexture::Pixels(CpuImage::rgba8(
            width,
            height,
            rgba.into_raw(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([255, 0, 0, 255]));
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn claims_by_extension_then_by_content() {
        let loader = ImageLoader::new();
        let caps = Capabilities::default();
        assert!(loader.can_load(".png", None, &caps));
        assert!(loader.can_load("", None, &caps));
        assert!(!loader.can_load(".ktx", None, &caps));
        assert!(loader.can_load(".bin", Some(&png_bytes(1, 1)), &caps));
        assert!(!loader.can_load(".png", Some(b"not an image"), &caps));
    }

    #[test]
    fn decodes_png_to_rgba8() {
        let loader = ImageLoader::new();
        let decoded = loader.load_data(&png_bytes(3, 2), &Capabilities::default()).unwrap();
        let DecodedTexture::Pixels(image) = decoded else {
            panic!("expected pixels");
        };
        assert_eq!((image.width, image.height), (3, 2));
        assert_eq!(image.pixels.len(), 3 * 2 * 4);
        assert_eq!(&image.pixels[..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let loader = ImageLoader::new();
        let error = loader.load_data(b"\x89PNG\r\n\x1a\ngarbage", &Capabilities::default());
        assert!(error.is_err());
    }
}
