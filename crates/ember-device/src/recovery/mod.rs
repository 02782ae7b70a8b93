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

//! Context-loss bookkeeping.
//!
//! The controller only tracks the lifecycle; the device owns the resources
//! and runs the rebuild steps in [`RestoreStep`] order.

use crate::resources::RebuildReport;
use ember_core::renderer::{DeviceError, LossResponse};

/// Lifecycle of the native context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextState {
    /// Rendering normally.
    #[default]
    Active,
    /// The context is gone; draws and frame callbacks are skipped.
    Lost,
    /// A restore is in progress.
    Restoring,
}

/// The fixed steps of a restore, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RestoreStep {
    /// A native context was acquired (or the existing one came back).
    AcquireContext,
    /// Capabilities were probed again.
    ProbeCapabilities,
    /// Cached programs were re-linked.
    Programs,
    /// Textures were re-created.
    Textures,
    /// Buffers and vertex arrays were re-created.
    Buffers,
    /// The state cache was fully wiped.
    WipeCaches,
}

/// What a successful restore rebuilt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Steps in the order they ran.
    pub steps: Vec<RestoreStep>,
    /// Program results.
    pub programs: RebuildReport,
    /// Texture results.
    pub textures: RebuildReport,
    /// Buffer results.
    pub buffers: RebuildReport,
    /// Vertex array results.
    pub vertex_arrays: RebuildReport,
}

impl RestoreReport {
    /// Records a completed step.
    pub fn step(&mut self, step: RestoreStep) {
        self.steps.push(step);
    }

    /// Number of resources that could not be rebuilt.
    pub fn failures(&self) -> usize {
        self.programs.failed + self.textures.failed + self.buffers.failed + self.vertex_arrays.failed
    }
}

/// Tracks loss and restore signals.
#[derive(Debug, Clone)]
pub struct RecoveryController {
    state: ContextState,
    enabled: bool,
    losses: u32,
    restores: u32,
}

impl RecoveryController {
    /// Creates a controller. With `enabled == false` loss signals are ignored
    /// and the host's default action runs.
    pub fn new(enabled: bool) -> Self {
        Self {
            state: ContextState::Active,
            enabled,
            losses: 0,
            restores: 0,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ContextState {
        self.state
    }

    /// Returns `true` unless the context is active.
    pub fn is_lost(&self) -> bool {
        self.state != ContextState::Active
    }

    /// Returns `true` if loss signals are handled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of losses handled.
    pub fn loss_count(&self) -> u32 {
        self.losses
    }

    /// Number of successful restores.
    pub fn restore_count(&self) -> u32 {
        self.restores
    }

    /// Handles a loss signal. Returns `None` when the signal must be ignored
    /// because handling is disabled or the context is already lost.
    pub fn on_context_lost(&mut self) -> Option<LossResponse> {
        if !self.enabled {
            return None;
        }
        if self.state == ContextState::Lost {
            return Some(LossResponse::PreventDefault);
        }
        self.state = ContextState::Lost;
        self.losses += 1;
        log::warn!("Graphics context lost");
        Some(LossResponse::PreventDefault)
    }

    /// The host's response to a loss signal.
    pub fn loss_response(&self) -> LossResponse {
        if self.enabled {
            LossResponse::PreventDefault
        } else {
            LossResponse::Default
        }
    }

    /// Enters `Restoring`. Returns `false` if no restore is due.
    pub fn begin_restore(&mut self) -> bool {
        if !self.enabled || self.state != ContextState::Lost {
            return false;
        }
        self.state = ContextState::Restoring;
        true
    }

    /// Leaves `Restoring`: back to `Active` on success, `Lost` on failure.
    pub fn finish_restore(&mut self, result: &Result<RestoreReport, DeviceError>) {
        if self.state != ContextState::Restoring {
            return;
        }
        match result {
            Ok(report) => {
                self.state = ContextState::Active;
                self.restores += 1;
                if report.failures() > 0 {
                    log::warn!(
                        "Graphics context restored with {} resources left unbuilt",
                        report.failures()
                    );
                } else {
                    log::info!("Graphics context restored");
                }
            }
            Err(err) => {
                self.state = ContextState::Lost;
                log::error!("{err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loss_and_restore_cycle() {
        let mut recovery = RecoveryController::new(true);
        assert_eq!(recovery.on_context_lost(), Some(LossResponse::PreventDefault));
        assert!(recovery.is_lost());
        assert!(recovery.begin_restore());
        assert_eq!(recovery.state(), ContextState::Restoring);
        assert!(recovery.is_lost());

        recovery.finish_restore(&Ok(RestoreReport::default()));
        assert_eq!(recovery.state(), ContextState::Active);
        assert_eq!(recovery.loss_count(), 1);
        assert_eq!(recovery.restore_count(), 1);
    }

    #[test]
    fn failed_restore_stays_lost() {
        let mut recovery = RecoveryController::new(true);
        recovery.on_context_lost();
        recovery.begin_restore();
        recovery.finish_restore(&Err(DeviceError::RestoreFailed("no context".into())));
        assert_eq!(recovery.state(), ContextState::Lost);
        assert!(recovery.begin_restore());
    }

    #[test]
    fn restore_requires_a_loss() {
        let mut recovery = RecoveryController::new(true);
        assert!(!recovery.begin_restore());
        assert_eq!(recovery.state(), ContextState::Active);
    }

    #[test]
    fn repeated_loss_signals_count_once() {
        let mut recovery = RecoveryController::new(true);
        recovery.on_context_lost();
        recovery.on_context_lost();
        assert_eq!(recovery.loss_count(), 1);
    }

    #[test]
    fn disabled_controller_ignores_signals() {
        let mut recovery = RecoveryController::new(false);
        assert_eq!(recovery.on_context_lost(), None);
        assert_eq!(recovery.loss_response(), LossResponse::Default);
        assert!(!recovery.is_lost());
        assert!(!recovery.begin_restore());
    }
}
