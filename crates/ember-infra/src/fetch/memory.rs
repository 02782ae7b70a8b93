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
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct MemoryState {
    entries: HashMap<String, Vec<u8>>,
    requested: Vec<String>,
    pending: Vec<(FetchRequest, flume::Sender<FetchCompletion>)>,
    aborted: Vec<RequestId>,
}

/// Serves bytes from an in-memory table.
///
/// An immediate fetcher completes inside [`Fetcher::fetch`]; a deferred one
/// holds requests until [`MemoryFetcher::flush`]. Unknown URLs fail with a
/// "not found" message. Clones share the table and the request log.
#[derive(Debug, Clone, Default)]
pub struct MemoryFetcher {
    deferred: bool,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryFetcher {
    /// A fetcher that completes immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// A fetcher that completes on [`MemoryFetcher::flush`].
    pub fn deferred() -> Self {
        Self {
            deferred: true,
            ..Self::default()
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serves `bytes` for `url`.
    pub fn insert(&self, url: impl Into<String>, bytes: Vec<u8>) {
        self.state().entries.insert(url.into(), bytes);
    }

    /// Stops serving `url`.
    pub fn remove(&self, url: &str) {
        self.state().entries.remove(url);
    }

    /// Every requested URL, in request order.
    pub fn requested_urls(&self) -> Vec<String> {
        self.state().requested.clone()
    }

    /// Requests aborted while in flight.
    pub fn aborted_requests(&self) -> Vec<RequestId> {
        self.state().aborted.clone()
    }

    /// Number of requests waiting for a flush.
    pub fn pending_count(&self) -> usize {
        self.state().pending.len()
    }

    /// Completes every held request. Returns how many were completed.
    pub fn flush(&self) -> usize {
        let mut state = self.state();
        let pending = std::mem::take(&mut state.pending);
        let count = pending.len();
        for (request, sink) in pending {
            let completion = Self::complete(&state.entries, request);
            Self::deliver(&sink, completion);
        }
        count
    }

    fn complete(entries: &HashMap<String, Vec<u8>>, request: FetchRequest) -> FetchCompletion {
        let result = entries
            .get(&request.url)
            .cloned()
            .ok_or_else(|| format!("{}: not found", request.url));
        FetchCompletion {
            id: request.id,
            result,
        }
    }

    fn deliver(sink: &flume::Sender<FetchCompletion>, completion: FetchCompletion) {
        let id = completion.id;
        if sink.send(completion).is_err() {
            log::debug!("Completion for {id:?} dropped: receiver is gone");
        }
    }
}

impl Fetcher for MemoryFetcher {
    fn fetch(&mut self, request: FetchRequest, sink: flume::Sender<FetchCompletion>) {
        let mut state = self.state();
        state.requested.push(request.url.clone());
        if self.deferred {
            state.pending.push((request, sink));
        } else {
            let completion = Self::complete(&state.entries, request);
            Self::deliver(&sink, completion);
        }
    }

    fn abort(&mut self, id: RequestId) {
        let mut state = self.state();
        let before = state.pending.len();
        state.pending.retain(|(request, _)| request.id != id);
        if state.pending.len() != before {
            state.aborted.push(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: u64, url: &str) -> FetchRequest {
        FetchRequest {
            id: RequestId(id),
            url: url.to_string(),
        }
    }

    #[test]
    fn immediate_fetch_completes_inline() {
        let mut fetcher = MemoryFetcher::new();
        fetcher.insert("a.png", vec![1, 2, 3]);
        let (tx, rx) = flume::unbounded();

        fetcher.fetch(request(1, "a.png"), tx.clone());
        fetcher.fetch(request(2, "b.png"), tx);

        assert_eq!(rx.try_recv().unwrap().result, Ok(vec![1, 2, 3]));
        let missing = rx.try_recv().unwrap();
        assert_eq!(missing.id, RequestId(2));
        assert!(missing.result.unwrap_err().contains("b.png"));
    }

    #[test]
    fn deferred_fetch_waits_for_flush_and_honors_abort() {
        let mut fetcher = MemoryFetcher::deferred();
        fetcher.insert("a.png", vec![7]);
        let (tx, rx) = flume::unbounded();

        fetcher.fetch(request(1, "a.png"), tx.clone());
        fetcher.fetch(request(2, "a.png"), tx);
        assert!(rx.try_recv().is_err());

        fetcher.abort(RequestId(2));
        fetcher.abort(RequestId(99));
        assert_eq!(fetcher.aborted_requests(), vec![RequestId(2)]);

        assert_eq!(fetcher.flush(), 1);
        assert_eq!(rx.try_recv().unwrap().id, RequestId(1));
        assert!(rx.try_recv().is_err());
    }
}
