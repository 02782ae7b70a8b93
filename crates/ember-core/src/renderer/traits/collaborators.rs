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

//! Narrow views of the systems that sit on top of the device layer.

/// A scene owned by the engine.
pub trait SceneLink {
    /// Resets the per-camera render-id counters after a resize.
    fn reset_render_ids(&mut self);

    /// Called after the device finished rebuilding GPU resources.
    fn on_context_restored(&mut self) {}

    /// Releases the scene and everything it owns.
    fn dispose(&mut self);
}

/// A post-process registered with the engine but not attached to a camera.
pub trait PostProcessLink {
    /// Releases the post-process.
    fn dispose(&mut self);
}

/// A loading overlay shown while assets load.
pub trait LoadingScreen {
    /// Shows the overlay.
    fn display(&mut self);

    /// Hides the overlay.
    fn hide(&mut self);

    /// Releases the overlay.
    fn dispose(&mut self) {}
}
