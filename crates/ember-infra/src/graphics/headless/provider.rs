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

use super::config::HeadlessConfig;
use super::gl::HeadlessGl;
use ember_core::math::Extent2D;
use ember_core::renderer::{ApiVersion, ContextAttributes, ContextProvider, GraphicsApi};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct ProviderState {
    config: HeadlessConfig,
    surface: Extent2D,
    device_pixel_ratio: f32,
    current: Option<HeadlessGl>,
    acquired: usize,
    fail_acquire: bool,
    touch_action: Option<bool>,
    listeners_detached: bool,
    last_attributes: Option<ContextAttributes>,
}

/// A surface that hands out [`HeadlessGl`] contexts.
///
/// Like a canvas, the provider keeps returning the same context: a second
/// acquisition after a loss revives it in place. Clones share the surface.
#[derive(Debug, Clone)]
pub struct HeadlessProvider {
    state: Arc<Mutex<ProviderState>>,
}

impl HeadlessProvider {
    /// Creates a surface of `size` logical pixels.
    pub fn new(config: HeadlessConfig, size: Extent2D) -> Self {
        Self {
            state: Arc::new(Mutex::new(ProviderState {
                config,
                surface: size,
                device_pixel_ratio: 1.0,
                current: None,
                acquired: 0,
                fail_acquire: false,
                touch_action: None,
                listeners_detached: false,
                last_attributes: None,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The context handed out last.
    pub fn current(&self) -> Option<HeadlessGl> {
        self.state().current.clone()
    }

    /// Number of successful acquisitions.
    pub fn acquired_count(&self) -> usize {
        self.state().acquired
    }

    /// The attributes of the last acquisition attempt.
    pub fn last_attributes(&self) -> Option<ContextAttributes> {
        self.state().last_attributes
    }

    /// Makes every following acquisition fail.
    pub fn set_fail_acquire(&self, fail: bool) {
        self.state().fail_acquire = fail;
    }

    /// Resizes the surface.
    pub fn set_surface_size(&self, size: Extent2D) {
        self.state().surface = size;
    }

    /// Changes the reported device pixel ratio.
    pub fn set_device_pixel_ratio(&self, ratio: f32) {
        self.state().device_pixel_ratio = ratio;
    }

    /// The last touch-action toggle, if any.
    pub fn touch_action(&self) -> Option<bool> {
        self.state().touch_action
    }

    /// Returns `true` once the listeners were detached.
    pub fn listeners_detached(&self) -> bool {
        self.state().listeners_detached
    }
}

impl ContextProvider for HeadlessProvider {
    fn acquire(&mut self, attributes: &ContextAttributes) -> Option<Box<dyn GraphicsApi>> {
        let mut state = self.state();
        state.last_attributes = Some(*attributes);
        if state.fail_acquire {
            log::warn!("Headless surface refused to hand out a context");
            return None;
        }

        let gl = match &state.current {
            Some(gl) => {
                gl.restore_context();
                gl.clone()
            }
            None => {
                let mut config = state.config.clone();
                if attributes.max_version < config.version {
                    config.version = ApiVersion::V1;
                }
                log::debug!("Creating headless context (version {})", config.version.major());
                HeadlessGl::new(config)
            }
        };
        state.current = Some(gl.clone());
        state.acquired += 1;
        Some(Box::new(gl))
    }

    fn surface_size(&self) -> Extent2D {
        self.state().surface
    }

    fn device_pixel_ratio(&self) -> f32 {
        self.state().device_pixel_ratio
    }

    fn set_touch_action(&mut self, enabled: bool) {
        self.state().touch_action = Some(enabled);
    }

    fn detach_listeners(&mut self) {
        self.state().listeners_detached = true;
    }
}
