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

//! A small monotonic stopwatch used for frame and load timing.

use std::time::{Duration, Instant};

/// Measures elapsed wall-clock time from a starting instant.
#[derive(Debug, Clone)]
pub struct Stopwatch {
    start_time: Option<Instant>,
}

impl Stopwatch {
    /// Creates a new Stopwatch instance, already running.
    #[inline]
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
        }
    }

    /// Creates a stopwatch that has not been started.
    #[inline]
    pub fn stopped() -> Self {
        Self { start_time: None }
    }

    /// Returns `true` if the stopwatch has been started.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.start_time.is_some()
    }

    /// Returns the elapsed time since the stopwatch was started.
    ///
    /// `None` if the stopwatch has never been started.
    #[inline]
    pub fn elapsed(&self) -> Option<Duration> {
        self.start_time.map(|start| start.elapsed())
    }

    /// Returns the elapsed time in milliseconds as `f64`.
    #[inline]
    pub fn elapsed_ms_f64(&self) -> Option<f64> {
        self.elapsed().map(|d| d.as_secs_f64() * 1000.0)
    }

    /// Returns the elapsed time in seconds as `f64`.
    #[inline]
    pub fn elapsed_secs_f64(&self) -> Option<f64> {
        self.elapsed().map(|d| d.as_secs_f64())
    }

    /// Restarts the stopwatch and returns the time elapsed before the restart.
    pub fn lap(&mut self) -> Option<Duration> {
        let now = Instant::now();
        let elapsed = self.start_time.map(|start| now.saturating_duration_since(start));
        self.start_time = Some(now);
        elapsed
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn stopwatch_creation_starts_timer() {
        let watch = Stopwatch::new();
        assert!(watch.is_running());
        assert!(watch.elapsed().is_some());
        assert!(watch.elapsed_secs_f64().is_some());
    }

    #[test]
    fn stopped_stopwatch_reports_nothing() {
        let watch = Stopwatch::stopped();
        assert!(!watch.is_running());
        assert!(watch.elapsed().is_none());
        assert!(watch.elapsed_ms_f64().is_none());
    }

    #[test]
    fn lap_restarts_the_baseline() {
        let mut watch = Stopwatch::stopped();
        assert!(watch.lap().is_none(), "first lap on a stopped watch has no baseline");
        thread::sleep(Duration::from_millis(5));
        let lap = watch.lap().expect("watch is running after the first lap");
        assert!(lap >= Duration::from_millis(5));
        assert!(watch.elapsed().expect("running") < lap + Duration::from_millis(500));
    }
}
