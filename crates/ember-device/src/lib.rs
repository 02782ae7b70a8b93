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

//! # Ember Device
//!
//! The device layer: a redundant-call-suppressing state cache, resource
//! managers for buffers, textures, and programs, asynchronous texture
//! loading, draw dispatch, the frame loop, and context-loss recovery, all
//! driven through the `GraphicsApi` contract from `ember-core`.

#![warn(missing_docs)]

/// One-shot capability probing.
pub mod capability;
/// The borrowed device view used by managers.
pub mod context;
pub mod device;
pub mod draw;
pub mod frame;
pub mod loading;
pub mod recovery;
pub mod resources;
pub mod state;

pub use context::GpuContext;
pub use device::{DeviceOptions, GpuDevice};
pub use draw::{DrawDispatcher, DrawPhase, InstanceAttribute};
pub use frame::{FrameLoop, LockstepClock, PerfCounter, RenderCallback};
pub use loading::{KtxLoader, LoadQueue, TextureLoadFuture, TextureLoadOptions};
pub use recovery::{ContextState, RecoveryController, RestoreReport, RestoreStep};
pub use state::{StateCache, WipeLevel};
