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

//! Handle, descriptor, and state types used by the device layer.
//!
//! - **[`handles`]**: opaque native object handles returned by a [`GraphicsApi`](super::GraphicsApi).
//! - **[`buffer`]**, **[`texture`]**, **[`program`]**: engine-level ids and descriptors.
//! - **[`state`]**: fixed-function state enums (depth, stencil, blend, culling).
//! - **[`draw`]**: fill modes, topologies, and vertex input descriptions.
//! - **[`context`]**: context-level queries, limits, and compatibility aliases.

pub mod buffer;
pub mod context;
pub mod draw;
pub mod handles;
pub mod program;
pub mod state;
pub mod texture;

pub use self::buffer::*;
pub use self::context::*;
pub use self::draw::*;
pub use self::handles::*;
pub use self::program::*;
pub use self::state::*;
pub use self::texture::*;
