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

//! GPU resource managers.
//!
//! Every manager owns a table of resources keyed by id, counts references,
//! and can rebuild its resources after a context loss.

pub mod buffer;
pub mod pot;
pub mod program;
pub mod rescale;
pub mod texture;

pub use self::buffer::{BufferManager, GpuBuffer};
pub use self::program::{ProgramContext, ProgramManager};
pub use self::rescale::GpuRescaler;
pub use self::texture::{
    InternalTexture, RawTextureDescriptor, RenderTargetParts, TextureManager, TextureReadiness,
};

/// Outcome of a `rebuild_all` pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RebuildReport {
    /// Resources that are usable again.
    pub rebuilt: usize,
    /// Resources left waiting for their owner (no retained source).
    pub pending: usize,
    /// Resources whose rebuild failed.
    pub failed: usize,
}

impl RebuildReport {
    /// Sums two reports.
    pub fn merge(self, other: RebuildReport) -> RebuildReport {
        RebuildReport {
            rebuilt: self.rebuilt + other.rebuilt,
            pending: self.pending + other.pending,
            failed: self.failed + other.failed,
        }
    }
}
