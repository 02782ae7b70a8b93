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

//! Defines fill modes, primitive topologies, and vertex input descriptions.

use super::buffer::BufferId;
use super::handles::NativeBuffer;

/// The primitive assembly mode of a draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    /// Independent triangles.
    #[default]
    Triangles,
    /// A strip of triangles.
    TriangleStrip,
    /// A fan of triangles.
    TriangleFan,
    /// Independent lines.
    Lines,
    /// A connected line strip.
    LineStrip,
    /// A closed line loop.
    LineLoop,
    /// Points.
    Points,
}

/// How geometry is rasterized, as requested by materials.
///
/// Materials store fill modes as raw integers; [`FillMode::from_raw`] maps
/// unknown values to [`FillMode::TriangleFill`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    /// Filled triangles.
    #[default]
    TriangleFill = 0,
    /// Wireframe drawn as lines.
    WireFrameFill = 1,
    /// Vertices drawn as points.
    PointFill = 2,
    /// A point list.
    PointListDraw = 3,
    /// A line list.
    LineListDraw = 4,
    /// A closed line loop.
    LineLoopDraw = 5,
    /// A line strip.
    LineStripDraw = 6,
    /// A triangle strip.
    TriangleStripDraw = 7,
    /// A triangle fan.
    TriangleFanDraw = 8,
}

impl FillMode {
    /// Maps a raw material value, falling back to triangles.
    pub fn from_raw(value: u32) -> Self {
        match value {
            1 => FillMode::WireFrameFill,
            2 => FillMode::PointFill,
            3 => FillMode::PointListDraw,
            4 => FillMode::LineListDraw,
            5 => FillMode::LineLoopDraw,
            6 => FillMode::LineStripDraw,
            7 => FillMode::TriangleStripDraw,
            8 => FillMode::TriangleFanDraw,
            _ => FillMode::TriangleFill,
        }
    }

    /// The topology used to draw this fill mode.
    pub fn topology(self) -> PrimitiveTopology {
        match self {
            FillMode::TriangleFill => PrimitiveTopology::Triangles,
            FillMode::PointFill | FillMode::PointListDraw => PrimitiveTopology::Points,
            FillMode::WireFrameFill | FillMode::LineListDraw => PrimitiveTopology::Lines,
            FillMode::LineLoopDraw => PrimitiveTopology::LineLoop,
            FillMode::LineStripDraw => PrimitiveTopology::LineStrip,
            FillMode::TriangleStripDraw => PrimitiveTopology::TriangleStrip,
            FillMode::TriangleFanDraw => PrimitiveTopology::TriangleFan,
        }
    }
}

/// The component type of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexDataType {
    /// `i8`
    Byte,
    /// `u8`
    UnsignedByte,
    /// `i16`
    Short,
    /// `u16`
    UnsignedShort,
    /// `i32`
    Int,
    /// `u32`
    UnsignedInt,
    /// `f32`
    #[default]
    Float,
}

impl VertexDataType {
    /// Size of one component in bytes.
    pub const fn byte_size(self) -> u32 {
        match self {
            VertexDataType::Byte | VertexDataType::UnsignedByte => 1,
            VertexDataType::Short | VertexDataType::UnsignedShort => 2,
            VertexDataType::Int | VertexDataType::UnsignedInt | VertexDataType::Float => 4,
        }
    }
}

/// The memory layout of one attribute inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    /// Number of components (1 to 4).
    pub components: u32,
    /// Component type.
    pub data_type: VertexDataType,
    /// Normalize integer components to `[0, 1]` or `[-1, 1]`.
    pub normalized: bool,
    /// Byte distance between consecutive elements; 0 means tightly packed.
    pub stride: u32,
    /// Byte offset of the first element.
    pub offset: u32,
}

impl VertexLayout {
    /// A tightly packed float attribute.
    pub const fn floats(components: u32) -> Self {
        Self {
            components,
            data_type: VertexDataType::Float,
            normalized: false,
            stride: 0,
            offset: 0,
        }
    }

    /// The effective stride in bytes.
    pub const fn effective_stride(&self) -> u32 {
        if self.stride == 0 {
            self.components * self.data_type.byte_size()
        } else {
            self.stride
        }
    }
}

/// The pointer state of one attribute slot, as tracked by the state cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttribPointer {
    /// Buffer the pointer reads from.
    pub buffer: NativeBuffer,
    /// Layout inside that buffer.
    pub layout: VertexLayout,
}

/// A buffer feeding a named program attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexSource {
    /// Program attribute name, e.g. `position`.
    pub attribute: String,
    /// The buffer holding the data.
    pub buffer: BufferId,
    /// Layout of the attribute in the buffer.
    pub layout: VertexLayout,
}

impl VertexSource {
    /// Creates a source for `attribute`.
    pub fn new(attribute: impl Into<String>, buffer: BufferId, layout: VertexLayout) -> Self {
        Self {
            attribute: attribute.into(),
            buffer,
            layout,
        }
    }
}

/// An opaque handle to a recorded vertex array object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexArrayId(pub usize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_fill_modes_draw_triangles() {
        assert_eq!(FillMode::from_raw(42), FillMode::TriangleFill);
        assert_eq!(FillMode::from_raw(42).topology(), PrimitiveTopology::Triangles);
    }

    #[test]
    fn fill_modes_map_to_topologies() {
        assert_eq!(FillMode::from_raw(1).topology(), PrimitiveTopology::Lines);
        assert_eq!(FillMode::from_raw(2).topology(), PrimitiveTopology::Points);
        assert_eq!(FillMode::from_raw(5).topology(), PrimitiveTopology::LineLoop);
        assert_eq!(FillMode::from_raw(8).topology(), PrimitiveTopology::TriangleFan);
    }

    #[test]
    fn packed_layout_stride_is_derived() {
        assert_eq!(VertexLayout::floats(3).effective_stride(), 12);
        let strided = VertexLayout {
            stride: 32,
            ..VertexLayout::floats(3)
        };
        assert_eq!(strided.effective_stride(), 32);
    }
}
