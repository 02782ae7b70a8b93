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

//! Provides the backend-agnostic contracts of the Ember device layer.
//!
//! This module defines the "common language" shared by the device layer and
//! its backends: the [`GraphicsApi`] trait that models the stateful native
//! context, the handle and descriptor types that flow through it, the
//! [`Capabilities`] record, and the error hierarchy.
//!
//! The 'how' lives elsewhere: `ember-device` implements caching, resource
//! lifecycles, and recovery on top of these traits, and `ember-infra` provides
//! concrete backends.

pub mod api;
pub mod capabilities;
pub mod error;
pub mod traits;

// Re-export the most important traits and types for easier use.
pub use self::api::*;
pub use self::capabilities::{Capabilities, CompressedFormats};
pub use self::error::{
    DeviceError, LoadError, ProgramError, ResourceError, ResourceKind, ShaderError,
};
pub use self::traits::*;
