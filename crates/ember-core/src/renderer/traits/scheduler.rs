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

use std::fmt::Debug;
use std::time::Duration;

/// Identifies a scheduled frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameRequestId(pub u64);

/// Schedules the next iteration of the render loop.
///
/// The host owns the actual timing source. When a request fires, the host
/// calls back into the engine's frame entry point.
pub trait FrameScheduler: Debug {
    /// Returns `true` if the host can align frames with the display refresh.
    fn has_display_sync(&self) -> bool;

    /// Requests a callback at the next display refresh.
    fn request_display_sync(&mut self) -> FrameRequestId;

    /// Requests a callback after `delay`.
    fn request_timeout(&mut self, delay: Duration) -> FrameRequestId;

    /// Cancels a pending request. Unknown ids are ignored.
    fn cancel(&mut self, id: FrameRequestId);
}
