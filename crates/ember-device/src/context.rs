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

//! The disjoint borrows handed to resource managers.

use crate::state::StateCache;
use ember_core::renderer::{Capabilities, GraphicsApi};

/// The borrowed view of the device that managers operate on.
///
/// Managers own their resource tables but never the context. Passing the
/// context, the cache, and the capability record as disjoint borrows lets the
/// device hand them to one manager while it holds another.
pub struct GpuContext<'a> {
    /// The native context.
    pub api: &'a mut dyn GraphicsApi,
    /// The bound-state mirror.
    pub cache: &'a mut StateCache,
    /// What the context supports.
    pub caps: &'a Capabilities,
}

impl<'a> GpuContext<'a> {
    /// Bundles the three borrows.
    pub fn new(
        api: &'a mut dyn GraphicsApi,
        cache: &'a mut StateCache,
        caps: &'a Capabilities,
    ) -> Self {
        Self { api, cache, caps }
    }
}
