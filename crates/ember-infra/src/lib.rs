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

//! # Ember Infra
//!
//! Concrete implementations of the contracts defined in `ember-core`: a
//! headless recording graphics backend, fetchers, image decoding, a manual
//! frame scheduler, and logging setup.

#![warn(missing_docs)]

pub mod fetch;
pub mod graphics;
pub mod loaders;
pub mod logging;
pub mod scheduler;

pub use fetch::{FileFetcher, MemoryFetcher};
pub use graphics::headless::{GlCall, HeadlessConfig, HeadlessGl, HeadlessProvider};
pub use loaders::ImageLoader;
pub use scheduler::{ManualScheduler, ScheduledFrame};
