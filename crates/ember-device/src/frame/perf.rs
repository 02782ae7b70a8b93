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

use std::collections::VecDeque;

/// Number of frames averaged by [`PerfCounter`].
pub const PERF_WINDOW: usize = 60;

/// Rolling frame-time statistics.
#[derive(Debug, Clone)]
pub struct PerfCounter {
    samples: VecDeque<f64>,
    total: f64,
    last: f64,
}

impl Default for PerfCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl PerfCounter {
    /// Creates an empty counter.
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(PERF_WINDOW),
            total: 0.0,
            last: 0.0,
        }
    }

    /// Records one frame duration in milliseconds.
    pub fn sample(&mut self, frame_ms: f64) {
        if self.samples.len() == PERF_WINDOW {
            if let Some(oldest) = self.samples.pop_front() {
                self.total -= oldest;
            }
        }
        self.samples.push_back(frame_ms);
        self.total += frame_ms;
        self.last = frame_ms;
    }

    /// Average frame time over the window, in milliseconds.
    pub fn average_frame_time(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.total / self.samples.len() as f64
        }
    }

    /// Frames per second over the window; 0 before the first sample.
    pub fn fps(&self) -> f64 {
        let average = self.average_frame_time();
        if average > 0.0 {
            1000.0 / average
        } else {
            0.0
        }
    }

    /// Duration of the last frame, in milliseconds.
    pub fn delta_time(&self) -> f64 {
        self.last
    }

    /// Number of samples in the window.
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

/// Fixed-step accumulator for deterministic lockstep.
#[derive(Debug, Clone)]
pub struct LockstepClock {
    step_ms: f64,
    max_steps: u32,
    accumulator: f64,
}

impl LockstepClock {
    /// A clock stepping at 60 Hz.
    pub fn new(max_steps: u32) -> Self {
        Self::with_step(1000.0 / 60.0, max_steps)
    }

    /// A clock with an explicit step length.
    pub fn with_step(step_ms: f64, max_steps: u32) -> Self {
        Self {
            step_ms,
            max_steps,
            accumulator: 0.0,
        }
    }

    /// Step length in milliseconds.
    pub fn step_ms(&self) -> f64 {
        self.step_ms
    }

    /// Upper bound on steps per frame.
    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    /// Adds a frame's elapsed time and returns how many fixed steps to run.
    ///
    /// Time left over after hitting `max_steps` is dropped so a slow frame
    /// does not snowball into the next one.
    pub fn advance(&mut self, delta_ms: f64) -> u32 {
        self.accumulator += delta_ms.max(0.0);
        let mut steps = 0;
        while self.accumulator >= self.step_ms && steps < self.max_steps {
            self.accumulator -= self.step_ms;
            steps += 1;
        }
        if self.accumulator > self.step_ms {
            self.accumulator = 0.0;
        }
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn fps_averages_the_window() {
        let mut perf = PerfCounter::new();
        for _ in 0..10 {
            perf.sample(20.0);
        }
        assert_relative_eq!(perf.fps(), 50.0);
        assert_relative_eq!(perf.delta_time(), 20.0);
    }

    #[test]
    fn window_drops_old_samples() {
        let mut perf = PerfCounter::new();
        for _ in 0..PERF_WINDOW {
            perf.sample(100.0);
        }
        for _ in 0..PERF_WINDOW {
            perf.sample(10.0);
        }
        assert_eq!(perf.sample_count(), PERF_WINDOW);
        assert_relative_eq!(perf.average_frame_time(), 10.0, epsilon = 1e-9);
    }

    #[test]
    fn empty_counter_reports_zero() {
        assert_eq!(PerfCounter::new().fps(), 0.0);
    }

    #[test]
    fn lockstep_accumulates_partial_frames() {
        let mut clock = LockstepClock::with_step(10.0, 4);
        assert_eq!(clock.advance(6.0), 0);
        assert_eq!(clock.advance(6.0), 1);
        assert_eq!(clock.advance(25.0), 2);
    }

    #[test]
    fn lockstep_caps_steps_and_drops_backlog() {
        let mut clock = LockstepClock::with_step(10.0, 4);
        assert_eq!(clock.advance(100.0), 4);
        assert_eq!(clock.advance(0.0), 0);
    }
}
