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

//! A frame scheduler driven by hand.

use ember_core::renderer::{FrameRequestId, FrameScheduler};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// The kind of a scheduled frame request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledFrame {
    /// Aligned with the display refresh.
    DisplaySync,
    /// After a delay.
    Timeout(Duration),
}

#[derive(Debug, Default)]
struct SchedulerState {
    next_id: u64,
    pending: VecDeque<(FrameRequestId, ScheduledFrame)>,
    last_request: Option<ScheduledFrame>,
    requested: usize,
}

/// A [`FrameScheduler`] whose requests fire only when the owner pops them.
///
/// Tests and the sandbox call [`ManualScheduler::next_due`] to obtain the
/// request to fire, then hand the id to the engine's frame entry point.
/// Clones share the same request queue, so a clone can be handed to an
/// engine while the host keeps one to drive it.
#[derive(Debug, Clone)]
pub struct ManualScheduler {
    display_sync: bool,
    state: Arc<Mutex<SchedulerState>>,
}

impl ManualScheduler {
    fn new(display_sync: bool) -> Self {
        Self {
            display_sync,
            state: Arc::new(Mutex::new(SchedulerState::default())),
        }
    }

    /// A host with display-synchronized frames.
    pub fn with_display_sync() -> Self {
        Self::new(true)
    }

    /// A host that only offers timeouts.
    pub fn timeout_only() -> Self {
        Self::new(false)
    }

    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, frame: ScheduledFrame) -> FrameRequestId {
        let mut state = self.state();
        state.next_id += 1;
        let id = FrameRequestId(state.next_id);
        state.pending.push_back((id, frame));
        state.last_request = Some(frame);
        state.requested += 1;
        id
    }

    /// Removes and returns the oldest pending request.
    pub fn next_due(&self) -> Option<FrameRequestId> {
        self.state().pending.pop_front().map(|(id, _)| id)
    }

    /// Number of requests not yet fired or cancelled.
    pub fn pending_count(&self) -> usize {
        self.state().pending.len()
    }

    /// The kind of the most recent request.
    pub fn last_request(&self) -> Option<ScheduledFrame> {
        self.state().last_request
    }

    /// Total number of requests ever made.
    pub fn requested_count(&self) -> usize {
        self.state().requested
    }
}

impl FrameScheduler for ManualScheduler {
    fn has_display_sync(&self) -> bool {
        self.display_sync
    }

    fn request_display_sync(&mut self) -> FrameRequestId {
        self.push(ScheduledFrame::DisplaySync)
    }

    fn request_timeout(&mut self, delay: Duration) -> FrameRequestId {
        self.push(ScheduledFrame::Timeout(delay))
    }

    fn cancel(&mut self, id: FrameRequestId) {
        self.state().pending.retain(|(pending, _)| *pending != id);
    }
}
