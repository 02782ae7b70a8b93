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

//! The render loop registration list and frame scheduling.

mod perf;

pub use self::perf::{LockstepClock, PerfCounter, PERF_WINDOW};

use ember_core::renderer::{FrameRequestId, FrameScheduler};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// Delay used when the host cannot sync with the display.
pub const FRAME_TIMEOUT: Duration = Duration::from_millis(16);

/// A callback run once per frame. Identity is the allocation, so the same
/// `Rc` must be passed to [`FrameLoop::stop`].
pub type RenderCallback<C> = Rc<RefCell<dyn FnMut(&mut C)>>;

/// Wraps a closure into a [`RenderCallback`].
pub fn render_callback<C, F>(callback: F) -> RenderCallback<C>
where
    F: FnMut(&mut C) + 'static,
{
    Rc::new(RefCell::new(callback))
}

fn same_callback<C>(a: &RenderCallback<C>, b: &RenderCallback<C>) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

/// Ordered render callbacks plus the pending frame request.
///
/// The loop self-reschedules after every frame while at least one callback
/// is registered and stops requesting frames once the list is empty.
pub struct FrameLoop<C> {
    callbacks: Vec<RenderCallback<C>>,
    pending: Option<FrameRequestId>,
    frames: u64,
}

impl<C> std::fmt::Debug for FrameLoop<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLoop")
            .field("callbacks", &self.callbacks.len())
            .field("pending", &self.pending)
            .field("frames", &self.frames)
            .finish()
    }
}

impl<C> Default for FrameLoop<C> {
    fn default() -> Self {
        Self {
            callbacks: Vec::new(),
            pending: None,
            frames: 0,
        }
    }
}

impl<C> FrameLoop<C> {
    /// Creates an empty loop.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Returns `true` if no callback is registered.
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Returns `true` while a frame request is outstanding.
    pub fn is_scheduled(&self) -> bool {
        self.pending.is_some()
    }

    /// Frames run so far.
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Registers `callback` unless it is already registered, and starts
    /// requesting frames. Returns `false` for a duplicate.
    pub fn run(&mut self, callback: RenderCallback<C>, scheduler: &mut dyn FrameScheduler) -> bool {
        if self.callbacks.iter().any(|c| same_callback(c, &callback)) {
            return false;
        }
        self.callbacks.push(callback);
        if self.pending.is_none() {
            self.schedule(scheduler);
        }
        true
    }

    /// Removes one callback, or all of them with `None`. Cancels the pending
    /// request once the list is empty.
    pub fn stop(&mut self, callback: Option<&RenderCallback<C>>, scheduler: &mut dyn FrameScheduler) {
        match callback {
            Some(callback) => self.callbacks.retain(|c| !same_callback(c, callback)),
            None => self.callbacks.clear(),
        }
        if self.callbacks.is_empty() {
            if let Some(id) = self.pending.take() {
                scheduler.cancel(id);
            }
        }
    }

    fn schedule(&mut self, scheduler: &mut dyn FrameScheduler) {
        let id = if scheduler.has_display_sync() {
            scheduler.request_display_sync()
        } else {
            scheduler.request_timeout(FRAME_TIMEOUT)
        };
        self.pending = Some(id);
    }

    /// Claims the frame for a fired request. Returns the callbacks to run, in
    /// registration order, or `None` if `id` is stale.
    ///
    /// The list is a snapshot: callbacks may register or stop callbacks
    /// while the frame runs.
    pub fn begin(&mut self, id: FrameRequestId) -> Option<Vec<RenderCallback<C>>> {
        if self.pending != Some(id) {
            log::trace!("Ignoring stale frame request {id:?}");
            return None;
        }
        self.pending = None;
        self.frames += 1;
        Some(self.callbacks.clone())
    }

    /// Requests the next frame if callbacks remain.
    pub fn finish(&mut self, scheduler: &mut dyn FrameScheduler) {
        if !self.callbacks.is_empty() && self.pending.is_none() {
            self.schedule(scheduler);
        }
    }

    /// Removes every callback without touching a scheduler. Any pending
    /// request fires as stale.
    pub fn clear(&mut self) {
        self.callbacks.clear();
        self.pending = None;
    }
}

/// Runs a snapshot of callbacks against `target`.
///
/// A callback that is already running (re-entrant frame) is skipped.
pub fn run_callbacks<C>(callbacks: &[RenderCallback<C>], target: &mut C) {
    for callback in callbacks {
        match callback.try_borrow_mut() {
            Ok(mut callback) => (*callback)(target),
            Err(_) => log::debug!("Skipping a render callback that is already running"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_infra::scheduler::{ManualScheduler, ScheduledFrame};

    #[derive(Default)]
    struct Target {
        log: Vec<&'static str>,
    }

    #[test]
    fn callbacks_run_in_registration_order() {
        let mut scheduler = ManualScheduler::with_display_sync();
        let mut frame_loop = FrameLoop::<Target>::new();
        frame_loop.run(render_callback(|t: &mut Target| t.log.push("a")), &mut scheduler);
        frame_loop.run(render_callback(|t: &mut Target| t.log.push("b")), &mut scheduler);
        assert_eq!(scheduler.pending_count(), 1);

        let id = scheduler.next_due().unwrap();
        let callbacks = frame_loop.begin(id).unwrap();
        let mut target = Target::default();
        run_callbacks(&callbacks, &mut target);
        frame_loop.finish(&mut scheduler);

        assert_eq!(target.log, vec!["a", "b"]);
        assert_eq!(scheduler.pending_count(), 1);
        assert_eq!(frame_loop.frame_count(), 1);
    }

    #[test]
    fn duplicate_registration_is_ignored() {
        let mut scheduler = ManualScheduler::with_display_sync();
        let mut frame_loop = FrameLoop::<Target>::new();
        let callback = render_callback(|t: &mut Target| t.log.push("a"));
        assert!(frame_loop.run(callback.clone(), &mut scheduler));
        assert!(!frame_loop.run(callback, &mut scheduler));
        assert_eq!(frame_loop.len(), 1);
    }

    #[test]
    fn stopping_the_last_callback_ends_the_loop() {
        let mut scheduler = ManualScheduler::with_display_sync();
        let mut frame_loop = FrameLoop::<Target>::new();
        let a = render_callback(|t: &mut Target| t.log.push("a"));
        let b = render_callback(|t: &mut Target| t.log.push("b"));
        frame_loop.run(a.clone(), &mut scheduler);
        frame_loop.run(b, &mut scheduler);

        frame_loop.stop(Some(&a), &mut scheduler);
        assert_eq!(frame_loop.len(), 1);
        assert!(frame_loop.is_scheduled());

        frame_loop.stop(None, &mut scheduler);
        assert!(!frame_loop.is_scheduled());
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn falls_back_to_timeouts_without_display_sync() {
        let mut scheduler = ManualScheduler::timeout_only();
        let mut frame_loop = FrameLoop::<Target>::new();
        frame_loop.run(render_callback(|_: &mut Target| {}), &mut scheduler);
        assert_eq!(scheduler.last_request(), Some(ScheduledFrame::Timeout(FRAME_TIMEOUT)));
    }

    #[test]
    fn stale_requests_are_ignored() {
        let mut scheduler = ManualScheduler::with_display_sync();
        let mut frame_loop = FrameLoop::<Target>::new();
        frame_loop.run(render_callback(|_: &mut Target| {}), &mut scheduler);
        let id = scheduler.next_due().unwrap();
        assert!(frame_loop.begin(FrameRequestId(id.0 + 100)).is_none());
        assert!(frame_loop.begin(id).is_some());
        assert!(frame_loop.begin(id).is_none());
    }
}
