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

use crate::math::Extent2D;
use crate::renderer::api::ContextAttributes;
use crate::renderer::traits::GraphicsApi;
use std::fmt::Debug;

/// A rendering surface able to hand out native contexts.
///
/// The provider is kept for the lifetime of the engine so that a fresh
/// context can be acquired after a loss.
pub trait ContextProvider: Debug {
    /// Acquires a context, trying lower API versions when the requested one
    /// is unavailable. Returns `None` if no context can be created.
    fn acquire(&mut self, attributes: &ContextAttributes) -> Option<Box<dyn GraphicsApi>>;

    /// The surface size in logical pixels.
    fn surface_size(&self) -> Extent2D;

    /// Physical pixels per logical pixel.
    fn device_pixel_ratio(&self) -> f32 {
        1.0
    }

    /// Toggles the host's default touch gestures on the surface.
    fn set_touch_action(&mut self, _enabled: bool) {}

    /// Removes every platform listener the engine registered.
    fn detach_listeners(&mut self) {}
}
