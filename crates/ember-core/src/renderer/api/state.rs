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

//! Fixed-function render state types.

use crate::ember_bitflags;

/// A comparison used by depth and stencil tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunction {
    /// Never passes.
    Never,
    /// Passes if the new value is less.
    Less,
    /// Passes if the values are equal.
    Equal,
    /// Passes if the new value is less or equal.
    #[default]
    LessEqual,
    /// Passes if the new value is greater.
    Greater,
    /// Passes if the values differ.
    NotEqual,
    /// Passes if the new value is greater or equal.
    GreaterEqual,
    /// Always passes.
    Always,
}

/// What happens to a stencil value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StencilOp {
    /// Keep the current value.
    #[default]
    Keep,
    /// Set to zero.
    Zero,
    /// Set to the reference value.
    Replace,
    /// Increment, clamping at the maximum.
    Increment,
    /// Increment, wrapping to zero.
    IncrementWrap,
    /// Decrement, clamping at zero.
    Decrement,
    /// Decrement, wrapping to the maximum.
    DecrementWrap,
    /// Bitwise invert.
    Invert,
}

/// A blend factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    /// 0
    Zero,
    /// 1
    One,
    /// Source color.
    SrcColor,
    /// 1 - source color.
    OneMinusSrcColor,
    /// Source alpha.
    SrcAlpha,
    /// 1 - source alpha.
    OneMinusSrcAlpha,
    /// Destination color.
    DstColor,
    /// 1 - destination color.
    OneMinusDstColor,
    /// Destination alpha.
    DstAlpha,
    /// 1 - destination alpha.
    OneMinusDstAlpha,
    /// Constant color.
    ConstantColor,
    /// 1 - constant color.
    OneMinusConstantColor,
    /// Constant alpha.
    ConstantAlpha,
    /// 1 - constant alpha.
    OneMinusConstantAlpha,
    /// min(source alpha, 1 - destination alpha).
    SrcAlphaSaturate,
}

/// The operation combining source and destination after weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendEquation {
    /// src + dst
    #[default]
    Add,
    /// src - dst
    Subtract,
    /// dst - src
    ReverseSubtract,
    /// min(src, dst)
    Min,
    /// max(src, dst)
    Max,
}

/// Separate color and alpha blend factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendFunc {
    /// Source factor for color.
    pub src_rgb: BlendFactor,
    /// Destination factor for color.
    pub dst_rgb: BlendFactor,
    /// Source factor for alpha.
    pub src_alpha: BlendFactor,
    /// Destination factor for alpha.
    pub dst_alpha: BlendFactor,
}

impl BlendFunc {
    /// Creates a separate blend function.
    pub const fn new(
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) -> Self {
        Self {
            src_rgb,
            dst_rgb,
            src_alpha,
            dst_alpha,
        }
    }
}

/// Named blending presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AlphaMode {
    /// Blending off.
    #[default]
    Disable,
    /// Additive, weighted by source alpha.
    Add,
    /// Standard alpha compositing.
    Combine,
    /// Subtracts the source color.
    Subtract,
    /// Multiplies by the destination color.
    Multiply,
    /// Additive with inverse source color on the destination.
    Maximized,
    /// Pure additive.
    OneOne,
    /// Premultiplied-alpha "over" for color and alpha.
    PremultipliedPorterDuff,
    /// Screen blend.
    Screen,
}

impl AlphaMode {
    /// The blend function for this preset, or `None` when blending is off.
    pub fn blend_func(self) -> Option<BlendFunc> {
        use BlendFactor::*;
        Some(match self {
            AlphaMode::Disable => return None,
            AlphaMode::Add => BlendFunc::new(SrcAlpha, One, Zero, One),
            AlphaMode::Combine => BlendFunc::new(SrcAlpha, OneMinusSrcAlpha, One, One),
            AlphaMode::Subtract => BlendFunc::new(Zero, OneMinusSrcColor, One, One),
            AlphaMode::Multiply => BlendFunc::new(DstColor, Zero, One, One),
            AlphaMode::Maximized => BlendFunc::new(SrcAlpha, OneMinusSrcColor, One, One),
            AlphaMode::OneOne => BlendFunc::new(One, One, Zero, One),
            AlphaMode::PremultipliedPorterDuff => {
                BlendFunc::new(One, OneMinusSrcAlpha, One, OneMinusSrcAlpha)
            }
            AlphaMode::Screen => BlendFunc::new(One, OneMinusSrcColor, One, OneMinusSrcAlpha),
        })
    }
}

/// A polygon face selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Face {
    /// Front faces.
    Front,
    /// Back faces.
    #[default]
    Back,
    /// Both faces.
    FrontAndBack,
}

/// Winding order of front faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    /// Clockwise.
    Cw,
    /// Counter-clockwise.
    #[default]
    Ccw,
}

/// A fixed-function capability toggled with enable/disable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Depth testing.
    DepthTest,
    /// Face culling.
    CullFace,
    /// Blending.
    Blend,
    /// Stencil testing.
    StencilTest,
    /// Scissor testing.
    ScissorTest,
    /// Polygon offset for filled primitives.
    PolygonOffsetFill,
    /// Alpha-to-coverage.
    SampleAlphaToCoverage,
}

/// Per-channel color write mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorMask {
    /// Write red.
    pub r: bool,
    /// Write green.
    pub g: bool,
    /// Write blue.
    pub b: bool,
    /// Write alpha.
    pub a: bool,
}

impl ColorMask {
    /// All channels enabled.
    pub const ALL: Self = Self {
        r: true,
        g: true,
        b: true,
        a: true,
    };
}

impl Default for ColorMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// An RGBA color with float channels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
    /// Alpha.
    pub a: f32,
}

impl Color {
    /// Opaque black.
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Creates a color.
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

ember_bitflags! {
    /// The buffers affected by a clear.
    pub struct ClearMask: u32 {
        /// The color buffer.
        const COLOR = 1 << 0;
        /// The depth buffer.
        const DEPTH = 1 << 1;
        /// The stencil buffer.
        const STENCIL = 1 << 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_alpha_has_no_blend_func() {
        assert!(AlphaMode::Disable.blend_func().is_none());
    }

    #[test]
    fn combine_is_standard_alpha_blending() {
        let func = AlphaMode::Combine.blend_func().unwrap();
        assert_eq!(func.src_rgb, BlendFactor::SrcAlpha);
        assert_eq!(func.dst_rgb, BlendFactor::OneMinusSrcAlpha);
    }

    #[test]
    fn clear_mask_combines() {
        let mask = ClearMask::COLOR | ClearMask::DEPTH;
        assert!(mask.contains(ClearMask::COLOR));
        assert!(!mask.contains(ClearMask::STENCIL));
    }
}
