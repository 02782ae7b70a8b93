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

//! Defines data structures related to GPU buffer resources.

/// An opaque handle to a GPU buffer managed by the device.
///
/// Ids are never reused within a device, so a stale id can always be told
/// apart from a live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub usize);

/// The binding point a buffer is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Vertex attribute data.
    Array,
    /// Index data.
    ElementArray,
}

/// A hint describing how often a buffer's contents change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferUsageHint {
    /// Uploaded once, drawn many times.
    #[default]
    Static,
    /// Updated repeatedly, drawn many times.
    Dynamic,
    /// Updated once per draw.
    Stream,
}

/// What a buffer holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Per-vertex attribute data.
    Vertex,
    /// Element indices.
    Index,
    /// Per-instance attribute data.
    Instance,
}

impl BufferKind {
    /// The binding point used to upload this kind of buffer.
    pub fn target(self) -> BufferTarget {
        match self {
            BufferKind::Index => BufferTarget::ElementArray,
            BufferKind::Vertex | BufferKind::Instance => BufferTarget::Array,
        }
    }
}

/// The width of the indices stored in an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexFormat {
    /// 16-bit unsigned indices.
    #[default]
    Uint16,
    /// 32-bit unsigned indices.
    Uint32,
}

impl IndexFormat {
    /// Size of a single index in bytes.
    pub const fn byte_size(self) -> usize {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }

    /// Chooses the narrowest format able to hold every index.
    ///
    /// Returns `Uint32` only when some index exceeds `u16::MAX` and the device
    /// supports 32-bit indices.
    pub fn select(indices: &[u32], supports_uint32: bool) -> Self {
        let needs_wide = indices.iter().any(|&i| i > u16::MAX as u32);
        if needs_wide && supports_uint32 {
            IndexFormat::Uint32
        } else {
            IndexFormat::Uint16
        }
    }

    /// Encodes indices in this format, native-endian.
    ///
    /// Indices that do not fit a 16-bit format are truncated.
    pub fn encode(self, indices: &[u32]) -> Vec<u8> {
        match self {
            IndexFormat::Uint32 => bytemuck::cast_slice(indices).to_vec(),
            IndexFormat::Uint16 => {
                let narrow: Vec<u16> = indices.iter().map(|&i| i as u16).collect();
                bytemuck::cast_slice(&narrow).to_vec()
            }
        }
    }
}

/// Reinterprets a float slice as raw bytes for upload.
pub fn float_bytes(data: &[f32]) -> &[u8] {
    bytemuck::cast_slice(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_indices_stay_16_bit() {
        let indices = [0, 1, 2, 65535];
        assert_eq!(IndexFormat::select(&indices, true), IndexFormat::Uint16);
    }

    #[test]
    fn large_indices_need_capability() {
        let indices = [0, 1, 65536];
        assert_eq!(IndexFormat::select(&indices, true), IndexFormat::Uint32);
        assert_eq!(IndexFormat::select(&indices, false), IndexFormat::Uint16);
    }

    #[test]
    fn encode_uses_format_width() {
        let indices = [0, 1, 2];
        assert_eq!(IndexFormat::Uint16.encode(&indices).len(), 6);
        assert_eq!(IndexFormat::Uint32.encode(&indices).len(), 12);
    }

    #[test]
    fn float_bytes_covers_every_component() {
        let data = [1.0f32; 12];
        assert_eq!(float_bytes(&data).len(), 48);
    }

    #[test]
    fn index_kind_targets_element_array() {
        assert_eq!(BufferKind::Index.target(), BufferTarget::ElementArray);
        assert_eq!(BufferKind::Instance.target(), BufferTarget::Array);
    }
}
