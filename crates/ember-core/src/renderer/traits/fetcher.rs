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

/// Identifies an in-flight fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

/// A request handed to a [`Fetcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Identifies the request in the completion.
    pub id: RequestId,
    /// The URL to retrieve.
    pub url: String,
}

/// The outcome of a fetch, delivered through the completion channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCompletion {
    /// The request this completes.
    pub id: RequestId,
    /// The bytes, or a description of the failure.
    pub result: Result<Vec<u8>, String>,
}

/// Retrieves bytes for URLs.
///
/// Completions may be produced on any thread; they are sent through `sink`
/// and consumed on the engine thread. A fetcher must send at most one
/// completion per request and none after [`Fetcher::abort`].
pub trait Fetcher: Debug {
    /// Starts retrieving `request.url`.
    fn fetch(&mut self, request: FetchRequest, sink: flume::Sender<FetchCompletion>);

    /// Aborts an in-flight request. Unknown ids are ignored.
    fn abort(&mut self, id: RequestId);
}
