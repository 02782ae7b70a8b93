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

//! A cancellable future resolved when a texture load settles.

use ember_core::renderer::{LoadError, TextureId};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, Waker};

/// The outcome of a texture load.
pub type LoadResult = Result<TextureId, LoadError>;

#[derive(Debug, Default)]
struct LoadSlot {
    result: Option<LoadResult>,
    waker: Option<Waker>,
    cancel_requested: bool,
}

fn lock(slot: &Mutex<LoadSlot>) -> MutexGuard<'_, LoadSlot> {
    // The slot holds plain data, so a poisoned lock is still usable.
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Resolves once the load succeeds, fails for good, or is cancelled.
///
/// The future can be polled from any executor, or inspected without one
/// through [`try_result`](Self::try_result).
#[derive(Debug, Clone)]
pub struct TextureLoadFuture {
    slot: Arc<Mutex<LoadSlot>>,
}

impl TextureLoadFuture {
    /// Creates a future already resolved with `result`.
    pub fn resolved(result: LoadResult) -> Self {
        let (future, promise) = pair();
        promise.resolve(result);
        future
    }

    /// Requests cancellation.
    ///
    /// The future resolves with [`LoadError::Cancelled`] right away; the
    /// fetch itself is aborted on the next poll of the load queue once no
    /// other waiter remains.
    pub fn cancel(&self) {
        let waker = {
            let mut slot = lock(&self.slot);
            if slot.result.is_some() {
                return;
            }
            slot.cancel_requested = true;
            slot.result = Some(Err(LoadError::Cancelled));
            slot.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// The outcome, if the load has settled.
    pub fn try_result(&self) -> Option<LoadResult> {
        lock(&self.slot).result.clone()
    }

    /// Returns `true` once the load has settled.
    pub fn is_resolved(&self) -> bool {
        lock(&self.slot).result.is_some()
    }
}

impl Future for TextureLoadFuture {
    type Output = LoadResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = lock(&self.slot);
        match &slot.result {
            Some(result) => Poll::Ready(result.clone()),
            None => {
                slot.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

/// The resolving side of a [`TextureLoadFuture`].
#[derive(Debug)]
pub(crate) struct LoadPromise {
    slot: Arc<Mutex<LoadSlot>>,
}

impl LoadPromise {
    /// Settles the future. Later calls are ignored.
    pub(crate) fn resolve(&self, result: LoadResult) {
        let waker = {
            let mut slot = lock(&self.slot);
            if slot.result.is_some() {
                return;
            }
            slot.result = Some(result);
            slot.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Returns `true` if the waiter cancelled.
    pub(crate) fn is_cancelled(&self) -> bool {
        lock(&self.slot).cancel_requested
    }
}

/// Creates a connected future and promise.
pub(crate) fn pair() -> (TextureLoadFuture, LoadPromise) {
    let slot = Arc::new(Mutex::new(LoadSlot::default()));
    (
        TextureLoadFuture { slot: slot.clone() },
        LoadPromise { slot },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::Wake;

    struct CountingWaker(AtomicUsize);

    impl Wake for CountingWaker {
        fn wake(self: Arc<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn resolves_once() {
        let (future, promise) = pair();
        assert!(!future.is_resolved());
        promise.resolve(Ok(TextureId(3)));
        promise.resolve(Err(LoadError::Cancelled));
        assert_eq!(future.try_result(), Some(Ok(TextureId(3))));
    }

    #[test]
    fn cancel_resolves_and_flags_the_promise() {
        let (future, promise) = pair();
        future.cancel();
        assert!(promise.is_cancelled());
        assert_eq!(future.try_result(), Some(Err(LoadError::Cancelled)));
        promise.resolve(Ok(TextureId(1)));
        assert_eq!(future.try_result(), Some(Err(LoadError::Cancelled)));
    }

    #[test]
    fn cancel_after_resolution_is_ignored() {
        let future = TextureLoadFuture::resolved(Ok(TextureId(0)));
        future.cancel();
        assert_eq!(future.try_result(), Some(Ok(TextureId(0))));
    }

    #[test]
    fn polling_registers_and_wakes() {
        let (mut future, promise) = pair();
        let counter = Arc::new(CountingWaker(AtomicUsize::new(0)));
        let waker = Waker::from(counter.clone());
        let mut cx = Context::from_waker(&waker);

        assert!(Pin::new(&mut future).poll(&mut cx).is_pending());
        promise.resolve(Ok(TextureId(7)));
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert_eq!(
            Pin::new(&mut future).poll(&mut cx),
            Poll::Ready(Ok(TextureId(7)))
        );
    }
}
