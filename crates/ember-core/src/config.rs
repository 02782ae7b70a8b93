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

//! Engine construction options.
//!
//! Options are plain data with defaults for every field so that partial
//! JSON documents can be deserialized directly.

use crate::renderer::api::PotMode;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Options recognized when constructing an engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Request a multisampled default framebuffer.
    pub antialias: bool,
    /// Upper bound for the device pixel ratio used by adaptive resolution.
    pub limit_device_ratio: Option<f32>,
    /// Scale the render resolution with the device pixel ratio.
    pub adapt_to_device_ratio: bool,
    /// Ask the host to enter VR presentation automatically when available.
    pub auto_enable_webvr: bool,
    /// Force the version-1 API path even when version 2 is available.
    pub disable_webgl2_support: bool,
    /// Bootstrap the audio subsystem alongside the engine.
    pub audio_engine: bool,
    /// Enable the fixed-step animation mode.
    pub deterministic_lockstep: bool,
    /// Maximum number of fixed steps per frame in lockstep mode.
    pub lockstep_max_steps: u32,
    /// Opt out of automatic context-loss recovery.
    pub do_not_handle_context_lost: bool,
    /// Leave the surface's touch-action styling untouched.
    pub do_not_handle_touch_action: bool,
    /// Compile shaders with high float precision when the device supports it.
    pub use_high_precision_floats: bool,
    /// Keep the drawing buffer contents between frames.
    pub preserve_drawing_buffer: bool,
    /// Request a stencil buffer on the default framebuffer.
    pub stencil: bool,
    /// Keep rendering while the host window is in the background.
    pub render_even_in_background: bool,
    /// Ignore light cache wipes requested between frames.
    pub prevent_cache_wipe_between_frames: bool,
    /// Texture loaded in place of any texture whose load chain fails.
    pub fallback_texture_url: Option<String>,
    /// Rounding policy for power-of-two texture resizing.
    pub pot_mode: PotMode,
    /// Force a flush at the end of every frame. `None` lets the capability
    /// record decide.
    pub flush_on_end_frame: Option<bool>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            antialias: false,
            limit_device_ratio: None,
            adapt_to_device_ratio: false,
            auto_enable_webvr: false,
            disable_webgl2_support: false,
            audio_engine: true,
            deterministic_lockstep: false,
            lockstep_max_steps: 4,
            do_not_handle_context_lost: false,
            do_not_handle_touch_action: false,
            use_high_precision_floats: true,
            preserve_drawing_buffer: false,
            stencil: true,
            render_even_in_background: true,
            prevent_cache_wipe_between_frames: false,
            fallback_texture_url: None,
            pot_mode: PotMode::Nearest,
            flush_on_end_frame: None,
        }
    }
}

impl EngineOptions {
    /// Parses options from a JSON document. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse engine options")
    }

    /// Returns `true` if resources should keep CPU-side copies for recovery.
    pub fn retains_sources(&self) -> bool {
        !self.do_not_handle_context_lost
    }
}
