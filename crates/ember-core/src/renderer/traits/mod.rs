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

//! Defines the core architectural traits of the device layer.
//!
//! - [`GraphicsApi`]: the native context call surface.
//! - [`ContextProvider`]: a surface that can (re)acquire contexts.
//! - [`TextureLoader`]: a plugin turning bytes into texture data.
//! - [`Fetcher`]: retrieves bytes for URLs.
//! - [`FrameScheduler`]: schedules render-loop iterations.
//! - [`SceneLink`], [`PostProcessLink`], [`LoadingScreen`]: the collaborators
//!   the engine notifies and disposes.

mod collaborators;
mod context_provider;
mod fetcher;
mod graphics_api;
mod scheduler;
mod texture_loader;

pub use self::collaborators::*;
pub use self::context_provider::ContextProvider;
pub use self::fetcher::*;
pub use self::graphics_api::GraphicsApi;
pub use self::scheduler::*;
pub use self::texture_loader::*;
