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

use std::fmt;

/// Identifies a registered observer so it can be removed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Callback<T> = Box<dyn FnMut(&T)>;

/// A fire-and-forget event channel.
///
/// Observers are invoked synchronously, in registration order, every time
/// [`notify`](Observable::notify) is called. Unlike the engine's channel-based
/// buses, nothing is queued: an observer added during a notification only sees
/// later notifications.
pub struct Observable<T> {
    observers: Vec<(ObserverId, Callback<T>)>,
    next_id: u64,
}

impl<T> Observable<T> {
    /// Creates an observable with no observers.
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
            next_id: 0,
        }
    }

    /// Registers a new observer and returns its id.
    pub fn add(&mut self, callback: impl FnMut(&T) + 'static) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, Box::new(callback)));
        id
    }

    /// Removes an observer. Returns `false` if it was not registered.
    pub fn remove(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer, _)| *observer != id);
        before != self.observers.len()
    }

    /// Invokes every observer with `event`, in registration order.
    pub fn notify(&mut self, event: &T) {
        for (_, callback) in self.observers.iter_mut() {
            callback(event);
        }
    }

    /// Returns `true` if at least one observer is registered.
    pub fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Returns `true` if no observer is registered.
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Drops every observer.
    pub fn clear(&mut self) {
        self.observers.clear();
    }
}

impl<T> Default for Observable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("observers", &self.observers.len())
            .finish()
    }
}
