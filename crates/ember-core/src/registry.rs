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

//! An explicit, process-wide registry of live engine instances.
//!
//! Engines register themselves on construction and deregister on disposal.
//! Code that needs "the most recently created engine" receives the registry
//! as an injected dependency instead of reaching for ambient global state.
//!
//! # Example
//!
//! ```rust
//! use ember_core::registry::EngineRegistry;
//!
//! let registry = EngineRegistry::new();
//! let first = registry.register("main view");
//! let second = registry.register("preview");
//!
//! assert_eq!(registry.last_created(), Some(second));
//! registry.deregister(second);
//! assert_eq!(registry.last_created(), Some(first));
//! ```

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Unique identifier of an engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EngineId(pub Uuid);

impl EngineId {
    /// Generates a fresh random id.
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for EngineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRecord {
    /// The engine's id.
    pub id: EngineId,
    /// A human-readable label for diagnostics.
    pub label: String,
}

/// Registry of live engines, in creation order.
#[derive(Debug, Default)]
pub struct EngineRegistry {
    engines: Mutex<Vec<EngineRecord>>,
}

impl EngineRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            engines: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<EngineRecord>> {
        self.engines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a new engine and returns its id.
    pub fn register(&self, label: impl Into<String>) -> EngineId {
        let record = EngineRecord {
            id: EngineId::new_v4(),
            label: label.into(),
        };
        let id = record.id;
        log::debug!("Registering engine {} ({})", record.label, id);
        self.lock().push(record);
        id
    }

    /// Removes an engine. Returns `false` if it was not registered.
    pub fn deregister(&self, id: EngineId) -> bool {
        let mut engines = self.lock();
        let before = engines.len();
        engines.retain(|record| record.id != id);
        let removed = before != engines.len();
        if removed {
            log::debug!("Deregistered engine {id}");
        }
        removed
    }

    /// The most recently created engine that is still registered.
    #[must_use]
    pub fn last_created(&self) -> Option<EngineId> {
        self.lock().last().map(|record| record.id)
    }

    /// Returns `true` if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: EngineId) -> bool {
        self.lock().iter().any(|record| record.id == id)
    }

    /// Snapshot of all registered engines, in creation order.
    #[must_use]
    pub fn records(&self) -> Vec<EngineRecord> {
        self.lock().clone()
    }

    /// Number of registered engines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no engine is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_last_created() {
        let registry = EngineRegistry::new();
        assert!(registry.last_created().is_none());

        let a = registry.register("a");
        let b = registry.register("b");

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.last_created(), Some(b));
        assert!(registry.contains(a));
    }

    #[test]
    fn test_deregister_falls_back_to_previous() {
        let registry = EngineRegistry::new();
        let a = registry.register("a");
        let b = registry.register("b");

        assert!(registry.deregister(b));
        assert!(!registry.deregister(b));
        assert_eq!(registry.last_created(), Some(a));

        assert!(registry.deregister(a));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_records_keep_creation_order() {
        let registry = EngineRegistry::default();
        registry.register("first");
        registry.register("second");
        let labels: Vec<_> = registry.records().into_iter().map(|r| r.label).collect();
        assert_eq!(labels, vec!["first", "second"]);
    }
}
