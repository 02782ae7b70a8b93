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

use ember_core::renderer::{FetchCompletion, FetchRequest, Fetcher, RequestId};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Why a file could not be fetched.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL uses a scheme other than `file://` or a bare path.
    #[error("unsupported url scheme in '{0}'")]
    UnsupportedScheme(String),
    /// The URL escapes the fetcher's root directory.
    #[error("'{0}' escapes the asset root")]
    OutsideRoot(String),
    /// Reading the file failed.
    #[error("failed to read '{path}': {source}")]
    Io {
        /// The resolved path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Reads URLs as files below a root directory, one worker thread per request.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    root: PathBuf,
    in_flight: Arc<Mutex<HashSet<RequestId>>>,
}

impl FileFetcher {
    /// Serves files below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// The directory URLs are resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a URL to a path below the root.
    pub fn resolve(&self, url: &str) -> Result<PathBuf, FetchError> {
        let relative = match url.split_once("://") {
            Some(("file", rest)) => rest,
            Some(_) => return Err(FetchError::UnsupportedScheme(url.to_string())),
            None => url,
        };
        let relative = relative.split(['?', '#']).next().unwrap_or_default();
        let relative = relative.trim_start_matches('/');
        if relative.split(['/', '\\']).any(|part| part == "..") {
            return Err(FetchError::OutsideRoot(url.to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// Reads a URL synchronously.
    pub fn read(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let path = self.resolve(url)?;
        std::fs::read(&path).map_err(|source| FetchError::Io { path, source })
    }
}

impl Fetcher for FileFetcher {
    fn fetch(&mut self, request: FetchRequest, sink: flume::Sender<FetchCompletion>) {
        let FetchRequest { id, url } = request;
        let path = match self.resolve(&url) {
            Ok(path) => path,
            Err(e) => {
                log::warn!("Fetch of '{url}' rejected: {e}");
                let _ = sink.send(FetchCompletion {
                    id,
                    result: Err(e.to_string()),
                });
                return;
            }
        };

        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
        let in_flight = self.in_flight.clone();

        let spawned = std::thread::Builder::new()
            .name(format!("ember-fetch-{}", id.0))
            .spawn(move || {
                let result = std::fs::read(&path)
                    .map_err(|source| FetchError::Io { path, source }.to_string());
                let still_wanted = in_flight
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&id);
                if still_wanted && sink.send(FetchCompletion { id, result }).is_err() {
                    log::debug!("Completion for '{url}' dropped: receiver is gone");
                }
            });

        if let Err(e) = spawned {
            log::error!("Failed to spawn fetch worker: {e}");
            self.in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id);
        }
    }

    fn abort(&mut self, id: RequestId) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ember-fetch-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn resolves_file_urls_below_the_root() {
        let fetcher = FileFetcher::new("/assets");
        assert_eq!(
            fetcher.resolve("file:///textures/a.png?v=2").unwrap(),
            PathBuf::from("/assets/textures/a.png")
        );
        assert!(matches!(
            fetcher.resolve("https://example.com/a.png"),
            Err(FetchError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            fetcher.resolve("../secret"),
            Err(FetchError::OutsideRoot(_))
        ));
    }

    #[test]
    fn fetches_on_a_worker_thread() {
        let dir = scratch_dir("worker");
        std::fs::write(dir.join("a.bin"), [1u8, 2, 3]).unwrap();
        let mut fetcher = FileFetcher::new(&dir);
        let (tx, rx) = flume::unbounded();

        fetcher.fetch(
            FetchRequest {
                id: RequestId(1),
                url: "a.bin".into(),
            },
            tx.clone(),
        );
        fetcher.fetch(
            FetchRequest {
                id: RequestId(2),
                url: "missing.bin".into(),
            },
            tx,
        );

        let mut completions: Vec<_> = (0..2)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        completions.sort_by_key(|c| c.id);
        assert_eq!(completions[0].result, Ok(vec![1, 2, 3]));
        assert!(completions[1].result.is_err());
        std::fs::remove_dir_all(dir).ok();
    }
}
