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

//! Events the engine raises for its collaborators.

use ember_core::event::Observable;
use ember_core::math::Extent2D;
use ember_device::RestoreReport;

/// Timing of the frame being rendered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    /// Frames run since the loop started, this one included.
    pub frame: u64,
    /// Duration of the previous frame in milliseconds; 0 for the first one.
    pub delta_ms: f64,
    /// Fixed steps due this frame in lockstep mode; 0 otherwise.
    pub lockstep_steps: u32,
}

/// Engine-level observables, notified synchronously in registration order.
///
/// Shader compile events live on the program manager and are reachable
/// through [`Engine::on_before_shader_compile`](crate::Engine::on_before_shader_compile)
/// and [`Engine::on_after_shader_compile`](crate::Engine::on_after_shader_compile).
#[derive(Debug, Default)]
pub struct EngineEvents {
    /// The graphics context was lost.
    pub context_lost: Observable<()>,
    /// Every GPU resource was rebuilt after a loss.
    pub context_restored: Observable<RestoreReport>,
    /// The render size changed.
    pub resize: Observable<Extent2D>,
    /// The rendering surface gained input focus.
    pub canvas_focus: Observable<()>,
    /// The rendering surface lost input focus.
    pub canvas_blur: Observable<()>,
    /// A frame is about to run its render callbacks.
    pub begin_frame: Observable<FrameInfo>,
    /// A frame finished running its render callbacks.
    pub end_frame: Observable<FrameInfo>,
}

impl EngineEvents {
    /// Drops every observer of every event.
    pub fn clear(&mut self) {
        self.context_lost.clear();
        self.context_restored.clear();
        self.resize.clear();
        self.canvas_focus.clear();
        self.canvas_blur.clear();
        self.begin_frame.clear();
        self.end_frame.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn clear_drops_every_observer() {
        let mut events = EngineEvents::default();
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        events.resize.add(move |_| counter.set(counter.get() + 1));
        events.canvas_blur.add(|_| {});

        events.resize.notify(&Extent2D::new(4, 4));
        events.clear();
        events.resize.notify(&Extent2D::new(8, 8));

        assert_eq!(hits.get(), 1);
        assert!(events.canvas_blur.is_empty());
    }
}
