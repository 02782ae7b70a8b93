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

//! Provides structs for representing pixel extents and rectangles.

/// A two-dimensional extent, typically representing width and height.
///
/// This is commonly used for texture dimensions or surface sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2D {
    /// The width component of the extent.
    pub width: u32,
    /// The height component of the extent.
    pub height: u32,
}

impl Extent2D {
    /// Creates a new extent.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns `true` if either dimension is zero.
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of pixels covered by this extent.
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// A pixel rectangle used for viewport and scissor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Viewport {
    /// Left edge in pixels.
    pub x: i32,
    /// Bottom edge in pixels.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Viewport {
    /// Creates a new rectangle.
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A rectangle covering `extent` from the origin.
    pub const fn from_extent(extent: Extent2D) -> Self {
        Self::new(0, 0, extent.width, extent.height)
    }

    /// Converts a normalized viewport (all components in `[0, 1]`) to pixels.
    pub fn from_normalized(x: f32, y: f32, width: f32, height: f32, target: Extent2D) -> Self {
        let w = target.width as f32;
        let h = target.height as f32;
        Self::new(
            (x * w) as i32,
            (y * h) as i32,
            (width * w).max(0.0) as u32,
            (height * h).max(0.0) as u32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_reports_emptiness() {
        assert!(Extent2D::new(0, 10).is_empty());
        assert!(!Extent2D::new(1, 1).is_empty());
        assert_eq!(Extent2D::new(800, 600).area(), 480_000);
    }

    #[test]
    fn normalized_viewport_scales_to_target() {
        let vp = Viewport::from_normalized(0.0, 0.5, 1.0, 0.5, Extent2D::new(800, 600));
        assert_eq!(vp, Viewport::new(0, 300, 800, 300));
    }
}
