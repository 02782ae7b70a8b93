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

//! The per-load fallback chain as an explicit state machine.

use ember_core::renderer::LoadError;

/// Phase of a single texture load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    /// Waiting to be fetched.
    Requested,
    /// Bytes are being retrieved.
    Loading,
    /// Bytes were decoded, upload pending.
    Decoded,
    /// Uploaded.
    Ready,
    /// Every fallback was exhausted.
    Failed,
    /// Aborted by its owners.
    Cancelled,
}

/// What the queue should do after a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureAction {
    /// Retry with the alternate URL offered by the loader that failed; that
    /// loader is excluded from now on.
    RetryWithLoaderFallback {
        /// The URL to load instead.
        url: String,
    },
    /// Load the process-wide fallback texture in place of the original.
    LoadGlobalFallback {
        /// The fallback URL.
        url: String,
    },
    /// Give up, reporting the first failure.
    Abandon(LoadError),
}

/// Tracks one load through its phases and fallbacks.
///
/// Each fallback stage is attempted at most once, so a load that fails
/// everywhere terminates after at most three attempts.
#[derive(Debug, Clone)]
pub struct LoadMachine {
    phase: LoadPhase,
    url: String,
    original_url: String,
    loader: Option<usize>,
    excluded: Vec<usize>,
    loader_fallback_used: bool,
    global_fallback_used: bool,
    original_error: Option<LoadError>,
}

impl LoadMachine {
    /// Starts a load of `url`.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            phase: LoadPhase::Requested,
            original_url: url.clone(),
            url,
            loader: None,
            excluded: Vec::new(),
            loader_fallback_used: false,
            global_fallback_used: false,
            original_error: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    /// The URL of the current attempt.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The URL the caller asked for.
    pub fn original_url(&self) -> &str {
        &self.original_url
    }

    /// The loader selected for the current attempt.
    pub fn loader(&self) -> Option<usize> {
        self.loader
    }

    /// Returns `true` if the loader at `index` must not be used again.
    pub fn is_excluded(&self, index: usize) -> bool {
        self.excluded.contains(&index)
    }

    /// Returns `true` once the load can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.phase,
            LoadPhase::Ready | LoadPhase::Failed | LoadPhase::Cancelled
        )
    }

    /// `Requested -> Loading`, remembering which loader (if any) claimed the
    /// request.
    pub fn start_loading(&mut self, loader: Option<usize>) {
        if self.phase == LoadPhase::Requested {
            self.loader = loader;
            self.phase = LoadPhase::Loading;
        }
    }

    /// Records the loader chosen once the bytes were inspected.
    pub fn set_loader(&mut self, loader: Option<usize>) {
        self.loader = loader;
    }

    /// `Loading -> Decoded`.
    pub fn decoded(&mut self) {
        if self.phase == LoadPhase::Loading {
            self.phase = LoadPhase::Decoded;
        }
    }

    /// `Decoded -> Ready`.
    pub fn ready(&mut self) {
        if self.phase == LoadPhase::Decoded {
            self.phase = LoadPhase::Ready;
        }
    }

    /// Moves to `Cancelled` unless already terminal.
    pub fn cancel(&mut self) {
        if !self.is_terminal() {
            self.phase = LoadPhase::Cancelled;
        }
    }

    /// Fails without consulting fallbacks. Returns the error to report: the
    /// first failure of the load if there was one.
    pub fn fail(&mut self, error: LoadError) -> LoadError {
        self.phase = LoadPhase::Failed;
        self.original_error.take().unwrap_or(error)
    }

    /// Handles a failure of the current attempt.
    ///
    /// `loader_fallback` is the alternate URL offered by the loader that
    /// handled the attempt, and `global_fallback` the process-wide fallback
    /// texture URL.
    pub fn on_failure(
        &mut self,
        error: LoadError,
        loader_fallback: Option<String>,
        global_fallback: Option<&str>,
    ) -> FailureAction {
        if self.is_terminal() {
            return FailureAction::Abandon(self.original_error.clone().unwrap_or(error));
        }
        if self.original_error.is_none() {
            self.original_error = Some(error.clone());
        }

        if !self.loader_fallback_used {
            if let (Some(loader), Some(url)) = (self.loader, loader_fallback) {
                self.loader_fallback_used = true;
                self.excluded.push(loader);
                return self.retry(url, |url| FailureAction::RetryWithLoaderFallback { url });
            }
        }

        if !self.global_fallback_used {
            if let Some(url) = global_fallback.filter(|u| *u != self.url) {
                self.global_fallback_used = true;
                return self.retry(url.to_string(), |url| FailureAction::LoadGlobalFallback {
                    url,
                });
            }
        }

        FailureAction::Abandon(self.fail(error))
    }

    fn retry(&mut self, url: String, action: impl FnOnce(String) -> FailureAction) -> FailureAction {
        self.url = url.clone();
        self.loader = None;
        self.phase = LoadPhase::Requested;
        action(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network(url: &str) -> LoadError {
        LoadError::Network {
            url: url.to_string(),
            message: "404".to_string(),
        }
    }

    #[test]
    fn happy_path_walks_every_phase() {
        let mut machine = LoadMachine::new("a.png");
        assert_eq!(machine.phase(), LoadPhase::Requested);
        machine.start_loading(None);
        assert_eq!(machine.phase(), LoadPhase::Loading);
        machine.decoded();
        machine.ready();
        assert_eq!(machine.phase(), LoadPhase::Ready);
        assert!(machine.is_terminal());
    }

    #[test]
    fn fallback_chain_runs_each_stage_once() {
        let mut machine = LoadMachine::new("a.png");
        machine.start_loading(Some(0));

        let first = machine.on_failure(network("a-dxt.ktx"), Some("a.png".into()), Some("missing.png"));
        assert_eq!(
            first,
            FailureAction::RetryWithLoaderFallback {
                url: "a.png".into()
            }
        );
        assert!(machine.is_excluded(0));
        assert_eq!(machine.phase(), LoadPhase::Requested);

        machine.start_loading(Some(1));
        let second = machine.on_failure(network("a.png"), Some("other.png".into()), Some("missing.png"));
        assert_eq!(
            second,
            FailureAction::LoadGlobalFallback {
                url: "missing.png".into()
            }
        );

        machine.start_loading(None);
        let third = machine.on_failure(network("missing.png"), None, Some("missing.png"));
        assert_eq!(third, FailureAction::Abandon(network("a-dxt.ktx")));
        assert_eq!(machine.phase(), LoadPhase::Failed);
    }

    #[test]
    fn no_fallbacks_abandons_immediately() {
        let mut machine = LoadMachine::new("a.png");
        machine.start_loading(None);
        let action = machine.on_failure(network("a.png"), None, None);
        assert_eq!(action, FailureAction::Abandon(network("a.png")));
    }

    #[test]
    fn fallback_equal_to_current_url_is_skipped() {
        let mut machine = LoadMachine::new("missing.png");
        machine.start_loading(None);
        let action = machine.on_failure(network("missing.png"), None, Some("missing.png"));
        assert!(matches!(action, FailureAction::Abandon(_)));
    }

    #[test]
    fn cancel_is_terminal() {
        let mut machine = LoadMachine::new("a.png");
        machine.start_loading(None);
        machine.cancel();
        assert_eq!(machine.phase(), LoadPhase::Cancelled);
        machine.decoded();
        assert_eq!(machine.phase(), LoadPhase::Cancelled);
    }

    #[test]
    fn direct_failure_reports_the_first_error() {
        let mut machine = LoadMachine::new("a.png");
        machine.start_loading(Some(0));
        machine.on_failure(network("first"), Some("b.png".into()), None);
        machine.start_loading(None);
        machine.decoded();
        let reported = machine.fail(LoadError::Cancelled);
        assert_eq!(reported, network("first"));
    }
}
