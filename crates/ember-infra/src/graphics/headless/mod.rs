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

//! A headless implementation of [`GraphicsApi`](ember_core::renderer::GraphicsApi).
//!
//! [`HeadlessGl`] keeps a model of the native objects it hands out and
//! records every state-changing call as a [`GlCall`]. Nothing is rendered.
//! Tests use the call log to count forwarded calls, benches use it as a
//! near-zero-cost backend, and the sandbox runs on it.

mod call;
mod config;
mod gl;
mod provider;

pub use self::call::GlCall;
pub use self::config::HeadlessConfig;
pub use self::gl::HeadlessGl;
pub use self::provider::HeadlessProvider;
