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

//! Power-of-two sizing and CPU-side image resizing.

use ember_core::renderer::{CpuImage, PotMode, TextureFormat, TextureType};
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, LumaA, Pixel, Rgb, Rgba};

/// Returns `true` if `value` is a power of two.
pub fn is_power_of_two(value: u32) -> bool {
    value != 0 && value & (value - 1) == 0
}

/// The smallest power of two greater than or equal to `value`.
///
/// Saturates at `1 << 31` for values above it.
pub fn ceiling_pot(value: u32) -> u32 {
    value.max(1).checked_next_power_of_two().unwrap_or(1 << 31)
}

/// The largest power of two less than or equal to `value`.
pub fn floor_pot(value: u32) -> u32 {
    if value == 0 {
        return 1;
    }
    1 << (31 - value.leading_zeros())
}

/// The closest power of two; ties round down.
pub fn nearest_pot(value: u32) -> u32 {
    let ceil = ceiling_pot(value);
    let floor = floor_pot(value);
    if ceil.saturating_sub(value) < value - floor {
        ceil
    } else {
        floor
    }
}

/// Rounds `value` to a power of two with `mode`, capped at `max`.
pub fn power_of_two_size(value: u32, max: u32, mode: PotMode) -> u32 {
    let max = max.max(1);
    let value = value.min(max);
    let pot = match mode {
        PotMode::Nearest => nearest_pot(value),
        PotMode::Floor => floor_pot(value),
        PotMode::Ceiling => ceiling_pot(value),
    };
    pot.min(max)
}

/// Resizes an 8-bit image on the CPU.
///
/// Returns `None` for component types the CPU path does not handle. The
/// texture manager rejects those uploads as unsupported.
pub fn resize_image(image: &CpuImage, width: u32, height: u32) -> Option<CpuImage> {
    if image.ty != TextureType::UnsignedByte {
        return None;
    }
    let pixels = match image.format {
        TextureFormat::Rgba => resize_as::<Rgba<u8>>(image, width, height)?,
        TextureFormat::Rgb => resize_as::<Rgb<u8>>(image, width, height)?,
        TextureFormat::LuminanceAlpha | TextureFormat::Rg => {
            resize_as::<LumaA<u8>>(image, width, height)?
        }
        TextureFormat::Alpha | TextureFormat::Luminance | TextureFormat::Red => {
            resize_as::<Luma<u8>>(image, width, height)?
        }
        TextureFormat::Depth | TextureFormat::DepthStencil => return None,
    };
    Some(CpuImage {
        width,
        height,
        format: image.format,
        ty: image.ty,
        pixels,
    })
}

fn resize_as<P>(image: &CpuImage, width: u32, height: u32) -> Option<Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let source: ImageBuffer<P, &[u8]> =
        ImageBuffer::from_raw(image.width, image.height, image.pixels.as_slice())?;
    Some(imageops::resize(&source, width, height, FilterType::Triangle).into_raw())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pot_detection() {
        assert!(is_power_of_two(1));
        assert!(is_power_of_two(512));
        assert!(!is_power_of_two(0));
        assert!(!is_power_of_two(257));
    }

    #[test]
    fn rounding_modes() {
        assert_eq!(power_of_two_size(257, 4096, PotMode::Ceiling), 512);
        assert_eq!(power_of_two_size(257, 4096, PotMode::Floor), 256);
        assert_eq!(power_of_two_size(257, 4096, PotMode::Nearest), 256);
        assert_eq!(power_of_two_size(400, 4096, PotMode::Nearest), 512);
        assert_eq!(power_of_two_size(384, 4096, PotMode::Nearest), 256);
    }

    #[test]
    fn rounding_is_capped() {
        assert_eq!(power_of_two_size(3000, 2048, PotMode::Ceiling), 2048);
        assert_eq!(power_of_two_size(257, 256, PotMode::Ceiling), 256);
    }

    #[test]
    fn huge_sizes_do_not_overflow() {
        assert_eq!(power_of_two_size(u32::MAX, 4096, PotMode::Ceiling), 4096);
        assert_eq!(power_of_two_size(u32::MAX, 4096, PotMode::Nearest), 4096);
        assert_eq!(power_of_two_size((1 << 31) + 1, u32::MAX, PotMode::Ceiling), 1 << 31);
        assert_eq!(ceiling_pot(u32::MAX), 1 << 31);
        assert_eq!(nearest_pot(u32::MAX), 1 << 31);
    }

    #[test]
    fn cpu_resize_keeps_format() {
        let image = CpuImage::rgba8(3, 3, vec![255; 36]);
        let resized = resize_image(&image, 4, 4).unwrap();
        assert_eq!(resized.width, 4);
        assert_eq!(resized.pixels.len(), 64);
        assert!(resized.pixels.iter().all(|&p| p == 255));
    }

    #[test]
    fn cpu_resize_skips_float_images() {
        let image = CpuImage {
            width: 3,
            height: 3,
            format: TextureFormat::Rgba,
            ty: TextureType::Float,
            pixels: vec![0; 3 * 3 * 16],
        };
        assert!(resize_image(&image, 4, 4).is_none());
    }
}
