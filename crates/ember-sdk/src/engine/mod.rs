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

//! The engine facade.

mod builder;

pub use self::builder::{ContextSource, EngineBuilder};

use crate::events::{EngineEvents, FrameInfo};
use anyhow::Result;
use ember_core::event::ObserverId;
use ember_core::math::Extent2D;
use ember_core::renderer::{
    DeviceError, FrameRequestId, FrameScheduler, LoadingScreen, LossResponse, PostProcessLink,
    SceneLink, ShaderCompileInfo,
};
use ember_core::{EngineId, EngineOptions, EngineRegistry, Stopwatch};
use ember_device::frame::run_callbacks;
use ember_device::{
    FrameLoop, GpuDevice, LockstepClock, PerfCounter, RenderCallback, RestoreReport, WipeLevel,
};
use std::sync::Arc;

/// Render scaling derived from the device pixel ratio.
///
/// With `adapt_to_device_ratio` the engine renders at
/// `min(limit_device_ratio, device_pixel_ratio)` physical pixels per logical
/// pixel; otherwise at one.
fn initial_scaling_level(options: &EngineOptions, device_pixel_ratio: f32) -> f32 {
    if !options.adapt_to_device_ratio {
        return 1.0;
    }
    let ratio = options
        .limit_device_ratio
        .map_or(device_pixel_ratio, |limit| limit.min(device_pixel_ratio));
    if ratio > 0.0 {
        1.0 / ratio
    } else {
        1.0
    }
}

fn scaled_size(surface: Extent2D, scaling_level: f32) -> Extent2D {
    let scale = |value: u32| (value as f32 / scaling_level).floor().max(0.0) as u32;
    Extent2D::new(scale(surface.width), scale(surface.height))
}

/// A running engine: the device plus its render loop, size, events and
/// collaborators.
///
/// Hosts forward platform signals to the `handle_*` methods and fire
/// scheduled frames through [`Engine::render_frame`]. Dropping the engine
/// disposes it.
pub struct Engine {
    id: EngineId,
    label: String,
    registry: Arc<EngineRegistry>,
    device: GpuDevice,
    options: EngineOptions,
    scheduler: Box<dyn FrameScheduler>,
    frame_loop: FrameLoop<Engine>,
    events: EngineEvents,
    scenes: Vec<Box<dyn SceneLink>>,
    post_processes: Vec<Box<dyn PostProcessLink>>,
    loading_screen: Option<Box<dyn LoadingScreen>>,
    render_size: Extent2D,
    hardware_scaling_level: f32,
    backgrounded: bool,
    focused: bool,
    frame_timer: Stopwatch,
    perf: PerfCounter,
    lockstep: LockstepClock,
    last_frame: FrameInfo,
    disposed: bool,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("render_size", &self.render_size)
            .field("frame_loop", &self.frame_loop)
            .field("scenes", &self.scenes.len())
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl Engine {
    /// Creates an engine with default plugins and registers it in `registry`.
    ///
    /// Frames are requested from a [`ManualScheduler`](ember_infra::ManualScheduler);
    /// hosts that own a timing source use [`EngineBuilder::scheduler`].
    pub fn new(
        source: ContextSource,
        options: EngineOptions,
        registry: &Arc<EngineRegistry>,
    ) -> Result<Self> {
        EngineBuilder::new(source)
            .options(options)
            .registry(Arc::clone(registry))
            .build()
    }

    /// Starts a builder.
    pub fn builder(source: ContextSource) -> EngineBuilder {
        EngineBuilder::new(source)
    }

    fn assemble(
        mut device: GpuDevice,
        options: EngineOptions,
        registry: Arc<EngineRegistry>,
        scheduler: Box<dyn FrameScheduler>,
        label: String,
        surface_size: Extent2D,
    ) -> Self {
        let device_pixel_ratio = device
            .provider_mut()
            .map_or(1.0, |provider| provider.device_pixel_ratio());
        let hardware_scaling_level = initial_scaling_level(&options, device_pixel_ratio);

        if !options.do_not_handle_touch_action {
            if let Some(provider) = device.provider_mut() {
                provider.set_touch_action(false);
            }
        }
        if options.audio_engine {
            log::debug!("Audio bootstrap requested; left to the audio collaborator");
        }
        if options.auto_enable_webvr {
            log::debug!("VR presentation requested; left to the host");
        }

        let id = registry.register(label.clone());
        let render_size = match device.surface_size() {
            Some(_) => scaled_size(surface_size, hardware_scaling_level),
            None => surface_size,
        };
        let caps = device.caps();
        log::info!(
            "Engine '{}' created: API {:?}, {} / {}, {}x{}",
            label,
            caps.version,
            caps.vendor,
            caps.renderer,
            render_size.width,
            render_size.height
        );

        Self {
            id,
            label,
            registry,
            device,
            lockstep: LockstepClock::new(options.lockstep_max_steps),
            options,
            scheduler,
            frame_loop: FrameLoop::new(),
            events: EngineEvents::default(),
            scenes: Vec::new(),
            post_processes: Vec::new(),
            loading_screen: None,
            render_size,
            hardware_scaling_level,
            backgrounded: false,
            focused: false,
            frame_timer: Stopwatch::stopped(),
            perf: PerfCounter::new(),
            last_frame: FrameInfo {
                frame: 0,
                delta_ms: 0.0,
                lockstep_steps: 0,
            },
            disposed: false,
        }
    }

    // --- Accessors ---

    /// The engine's id in the registry.
    pub fn id(&self) -> EngineId {
        self.id
    }

    /// The label given at construction.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The options the engine was created with.
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// The GPU device.
    pub fn device(&self) -> &GpuDevice {
        &self.device
    }

    /// The GPU device, for creating resources and drawing.
    pub fn device_mut(&mut self) -> &mut GpuDevice {
        &mut self.device
    }

    /// The engine's events.
    pub fn events(&self) -> &EngineEvents {
        &self.events
    }

    /// The engine's events, for subscribing.
    pub fn events_mut(&mut self) -> &mut EngineEvents {
        &mut self.events
    }

    /// Subscribes to shader compilation starts.
    pub fn on_before_shader_compile(
        &mut self,
        callback: impl FnMut(&ShaderCompileInfo) + 'static,
    ) -> ObserverId {
        self.device.programs_mut().before_compile.add(callback)
    }

    /// Subscribes to shader compilation results.
    pub fn on_after_shader_compile(
        &mut self,
        callback: impl FnMut(&ShaderCompileInfo) + 'static,
    ) -> ObserverId {
        self.device.programs_mut().after_compile.add(callback)
    }

    /// Returns `true` while the context is lost or being restored.
    pub fn is_context_lost(&self) -> bool {
        self.device.is_context_lost()
    }

    /// Returns `true` once [`Engine::dispose`] ran.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    // --- Collaborators ---

    /// Adds a scene. The engine resets its render ids on resize, tells it
    /// about restores and disposes it with the engine.
    pub fn add_scene(&mut self, scene: Box<dyn SceneLink>) {
        self.scenes.push(scene);
    }

    /// Number of scenes owned by the engine.
    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }

    /// Adds a post-process not attached to any camera yet.
    pub fn add_post_process(&mut self, post_process: Box<dyn PostProcessLink>) {
        self.post_processes.push(post_process);
    }

    /// Sets the loading overlay, disposing the previous one.
    pub fn set_loading_screen(&mut self, screen: Box<dyn LoadingScreen>) {
        if let Some(mut previous) = self.loading_screen.replace(screen) {
            previous.dispose();
        }
    }

    /// Shows the loading overlay, if any.
    pub fn display_loading_ui(&mut self) {
        if let Some(screen) = self.loading_screen.as_mut() {
            screen.display();
        }
    }

    /// Hides the loading overlay, if any.
    pub fn hide_loading_ui(&mut self) {
        if let Some(screen) = self.loading_screen.as_mut() {
            screen.hide();
        }
    }

    // --- Render loop ---

    /// Registers a render callback and starts requesting frames. Returns
    /// `false` if the callback is already registered.
    pub fn run_render_loop(&mut self, callback: RenderCallback<Engine>) -> bool {
        if self.disposed {
            return false;
        }
        self.frame_loop.run(callback, &mut *self.scheduler)
    }

    /// Removes one render callback, or every callback with `None`.
    pub fn stop_render_loop(&mut self, callback: Option<&RenderCallback<Engine>>) {
        self.frame_loop.stop(callback, &mut *self.scheduler);
    }

    /// Number of registered render callbacks.
    pub fn render_loop_len(&self) -> usize {
        self.frame_loop.len()
    }

    /// Runs the frame for a fired scheduler request.
    ///
    /// Returns `true` if the callbacks ran. Stale requests do nothing. A
    /// frame is skipped, but the loop keeps going, while the context is lost
    /// or while the host is in the background without
    /// `render_even_in_background`.
    pub fn render_frame(&mut self, request: FrameRequestId) -> bool {
        if self.disposed {
            return false;
        }
        let Some(callbacks) = self.frame_loop.begin(request) else {
            return false;
        };

        let rendered = self.should_render();
        if rendered {
            self.begin_frame();
            run_callbacks(&callbacks, self);
            self.end_frame();
        } else {
            log::trace!("Skipping frame {}", self.frame_loop.frame_count());
        }

        if !self.disposed {
            self.frame_loop.finish(&mut *self.scheduler);
        }
        rendered
    }

    fn should_render(&self) -> bool {
        if self.device.is_context_lost() {
            return false;
        }
        !self.backgrounded || self.options.render_even_in_background
    }

    /// Starts a frame: samples timing, advances the lockstep clock, drains
    /// finished texture loads and raises `begin_frame`.
    pub fn begin_frame(&mut self) {
        let delta_ms = self
            .frame_timer
            .lap()
            .map_or(0.0, |elapsed| elapsed.as_secs_f64() * 1000.0);
        if delta_ms > 0.0 {
            self.perf.sample(delta_ms);
        }
        let lockstep_steps = if self.options.deterministic_lockstep {
            self.lockstep.advance(delta_ms)
        } else {
            0
        };

        let completed = self.device.begin_frame();
        if completed > 0 {
            log::trace!("{completed} texture loads completed");
        }

        self.last_frame = FrameInfo {
            frame: self.frame_loop.frame_count(),
            delta_ms,
            lockstep_steps,
        };
        let info = self.last_frame;
        self.events.begin_frame.notify(&info);
    }

    /// Ends a frame: flushes when needed, wipes the light caches unless told
    /// to keep them, and raises `end_frame`.
    pub fn end_frame(&mut self) {
        if self.disposed {
            return;
        }
        self.device.end_frame(self.options.flush_on_end_frame);
        self.device.wipe_caches(WipeLevel::Light, true);
        let info = self.last_frame;
        self.events.end_frame.notify(&info);
    }

    /// Timing of the last frame that ran.
    pub fn last_frame(&self) -> FrameInfo {
        self.last_frame
    }

    /// Frames per second over the last 60 frames.
    pub fn fps(&self) -> f64 {
        self.perf.fps()
    }

    /// Duration of the last frame in milliseconds.
    pub fn delta_time(&self) -> f64 {
        self.perf.delta_time()
    }

    /// The frame-time counter.
    pub fn perf_counter(&self) -> &PerfCounter {
        &self.perf
    }

    /// Returns `true` if animation consumers should step at a fixed rate.
    pub fn is_deterministic_lockstep(&self) -> bool {
        self.options.deterministic_lockstep
    }

    /// Upper bound on fixed steps per frame in lockstep mode.
    pub fn lockstep_max_steps(&self) -> u32 {
        self.options.lockstep_max_steps
    }

    /// Length of one fixed step in milliseconds.
    pub fn lockstep_step_ms(&self) -> f64 {
        self.lockstep.step_ms()
    }

    // --- Size ---

    /// The size of the drawing buffer.
    pub fn render_size(&self) -> Extent2D {
        self.render_size
    }

    /// Width of the drawing buffer.
    pub fn render_width(&self) -> u32 {
        self.render_size.width
    }

    /// Height of the drawing buffer.
    pub fn render_height(&self) -> u32 {
        self.render_size.height
    }

    /// Sets the drawing buffer size. Returns `false`, and does nothing, when
    /// the size is unchanged.
    pub fn set_size(&mut self, width: u32, height: u32) -> bool {
        let size = Extent2D::new(width, height);
        if size == self.render_size {
            return false;
        }
        self.render_size = size;
        for scene in &mut self.scenes {
            scene.reset_render_ids();
        }
        log::debug!("Engine '{}' resized to {width}x{height}", self.label);
        self.events.resize.notify(&size);
        true
    }

    /// Recomputes the drawing buffer size from the surface and the hardware
    /// scaling level. Engines built on a bare context have no surface and
    /// keep their size.
    pub fn resize(&mut self) -> bool {
        let Some(surface) = self.device.surface_size() else {
            return false;
        };
        let size = scaled_size(surface, self.hardware_scaling_level);
        self.set_size(size.width, size.height)
    }

    /// Logical pixels per rendered pixel.
    pub fn hardware_scaling_level(&self) -> f32 {
        self.hardware_scaling_level
    }

    /// Changes the hardware scaling level and resizes.
    pub fn set_hardware_scaling_level(&mut self, level: f32) -> bool {
        if level <= 0.0 {
            log::warn!("Ignoring non-positive hardware scaling level {level}");
            return false;
        }
        self.hardware_scaling_level = level;
        self.resize()
    }

    // --- Platform events ---

    /// The host window moved to (or back from) the background.
    pub fn set_backgrounded(&mut self, backgrounded: bool) {
        self.backgrounded = backgrounded;
    }

    /// Returns `true` while the host window is in the background.
    pub fn is_backgrounded(&self) -> bool {
        self.backgrounded
    }

    /// The rendering surface gained focus.
    pub fn handle_focus(&mut self) {
        self.focused = true;
        self.events.canvas_focus.notify(&());
    }

    /// The rendering surface lost focus.
    pub fn handle_blur(&mut self) {
        self.focused = false;
        self.events.canvas_blur.notify(&());
    }

    /// Returns `true` while the rendering surface has focus.
    pub fn has_focus(&self) -> bool {
        self.focused
    }

    /// Handles the platform's context-lost signal. Returns the response the
    /// host should give, or `None` when loss handling is disabled.
    pub fn handle_context_lost(&mut self) -> Option<LossResponse> {
        let was_lost = self.device.recovery().is_lost();
        let response = self.device.handle_context_lost()?;
        if !was_lost {
            self.events.context_lost.notify(&());
        }
        Some(response)
    }

    /// Handles the platform's context-restored signal: rebuilds every
    /// resource, tells the scenes, then raises `context_restored`.
    ///
    /// On failure the engine stays lost and frames keep being skipped.
    pub fn handle_context_restored(&mut self) -> Result<RestoreReport, DeviceError> {
        let report = self.device.restore_context()?;
        for scene in &mut self.scenes {
            scene.on_context_restored();
        }
        self.events.context_restored.notify(&report);
        Ok(report)
    }

    // --- Disposal ---

    /// Releases everything, in order: the loading overlay, the render loop,
    /// pending post-processes, the built-in textures, the scenes and the
    /// compiled programs. Then detaches platform listeners, aborts pending
    /// loads, deletes what is left on the GPU and leaves the registry.
    ///
    /// Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        if let Some(mut screen) = self.loading_screen.take() {
            screen.hide();
            screen.dispose();
        }
        self.frame_loop.stop(None, &mut *self.scheduler);
        for mut post_process in self.post_processes.drain(..) {
            post_process.dispose();
        }
        self.device.release_empty_textures();
        for mut scene in self.scenes.drain(..) {
            scene.dispose();
        }
        self.device.dispose_programs();

        if let Some(provider) = self.device.provider_mut() {
            provider.detach_listeners();
        }
        self.device.abort_loads();
        self.device.dispose();
        self.registry.deregister(self.id);
        self.events.clear();
        log::info!("Engine '{}' disposed", self.label);
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.dispose();
    }
}
