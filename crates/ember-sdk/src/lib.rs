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

//! The public-facing SDK for the Ember device layer.
//!
//! [`Engine`] wraps a [`GpuDevice`](ember_device::GpuDevice) with the parts a
//! host application talks to: construction from a surface or an existing
//! context, the render loop, resizing, platform event routing, context-loss
//! recovery hooks and orderly disposal.

#![warn(missing_docs)]

mod engine;
mod events;

pub use engine::{ContextSource, Engine, EngineBuilder};
pub use events::{EngineEvents, FrameInfo};

/// Commonly used types, re-exported for hosts.
pub mod prelude {
    pub use crate::{ContextSource, Engine, EngineBuilder, EngineEvents, FrameInfo};
    pub use ember_core::math::{Extent2D, Viewport};
    pub use ember_core::renderer::{
        BufferId, BufferUsageHint, Color, FillMode, FrameRequestId, LossResponse, ProgramId,
        ProgramKey, RenderTargetOptions, SamplingMode, TextureId, VertexLayout, VertexSource,
    };
    pub use ember_core::{EngineOptions, EngineRegistry};
    pub use ember_device::frame::render_callback;
    pub use ember_device::{RenderCallback, RestoreReport, TextureLoadOptions, WipeLevel};
}
