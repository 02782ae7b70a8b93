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

//! In-flight texture loads and their completion channel.

use super::data_uri;
use super::future::{pair, LoadPromise, LoadResult, TextureLoadFuture};
use super::machine::{FailureAction, LoadMachine};
use super::{extension_of, TextureLoadOptions};
use ember_core::renderer::{
    Capabilities, DecodedTexture, FetchCompletion, FetchRequest, Fetcher, LoadError, RequestId,
    ResourceError, TextureId, TextureLoader,
};
use std::collections::HashMap;
use std::fmt;

/// Invoked once when a load fails for good, with the first failure.
pub type ErrorCallback = Box<dyn FnOnce(&LoadError)>;

/// Where decoded textures land.
pub trait UploadTarget {
    /// Uploads decoded content into `texture`.
    fn upload(&mut self, texture: TextureId, decoded: DecodedTexture) -> Result<(), ResourceError>;
    /// Marks `texture` as permanently failed.
    fn mark_failed(&mut self, texture: TextureId);
    /// Returns `false` once `texture` has been released.
    fn is_alive(&self, texture: TextureId) -> bool;
}

struct ActiveLoad {
    texture: TextureId,
    machine: LoadMachine,
    options: TextureLoadOptions,
    waiters: Vec<LoadPromise>,
    on_error: Option<ErrorCallback>,
    inline: Option<Vec<u8>>,
}

impl ActiveLoad {
    fn resolve_all(&mut self, result: LoadResult) {
        for waiter in self.waiters.drain(..) {
            waiter.resolve(result.clone());
        }
    }

    fn all_cancelled(&self) -> bool {
        !self.waiters.is_empty() && self.waiters.iter().all(LoadPromise::is_cancelled)
    }

    /// The extension used to pick a loader for the current attempt. The
    /// forced extension only applies to the URL the caller asked for.
    fn extension(&self) -> String {
        let url = self.machine.url();
        if url == self.machine.original_url() {
            self.options.extension_for(url)
        } else {
            extension_of(url)
        }
    }
}

impl fmt::Debug for ActiveLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveLoad")
            .field("texture", &self.texture)
            .field("machine", &self.machine)
            .field("waiters", &self.waiters.len())
            .finish_non_exhaustive()
    }
}

/// Tracks every in-flight load.
///
/// Loaders are consulted in registration order; the default loader decodes
/// whatever no registered loader claims.
#[derive(Debug)]
pub struct LoadQueue {
    loaders: Vec<Box<dyn TextureLoader>>,
    default_loader: Option<Box<dyn TextureLoader>>,
    fetcher: Option<Box<dyn Fetcher>>,
    sender: flume::Sender<FetchCompletion>,
    receiver: flume::Receiver<FetchCompletion>,
    active: HashMap<RequestId, ActiveLoad>,
    next_request: u64,
    fallback_url: Option<String>,
}

impl Default for LoadQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadQueue {
    /// Creates a queue with no loaders and no fetcher.
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        Self {
            loaders: Vec::new(),
            default_loader: None,
            fetcher: None,
            sender,
            receiver,
            active: HashMap::new(),
            next_request: 0,
            fallback_url: None,
        }
    }

    /// Appends a loader plugin.
    pub fn register_loader(&mut self, loader: Box<dyn TextureLoader>) {
        log::debug!("Registered texture loader '{}'", loader.name());
        self.loaders.push(loader);
    }

    /// Sets the decoder used when no registered loader claims a payload.
    pub fn set_default_loader(&mut self, loader: Box<dyn TextureLoader>) {
        self.default_loader = Some(loader);
    }

    /// Sets the fetcher used for non-inline URLs.
    pub fn set_fetcher(&mut self, fetcher: Box<dyn Fetcher>) {
        self.fetcher = Some(fetcher);
    }

    /// Sets the texture loaded in place of textures that fail.
    pub fn set_fallback_url(&mut self, url: Option<String>) {
        self.fallback_url = url;
    }

    /// The process-wide fallback texture URL.
    pub fn fallback_url(&self) -> Option<&str> {
        self.fallback_url.as_deref()
    }

    /// Number of loads in flight.
    pub fn pending(&self) -> usize {
        self.active.len()
    }

    /// Returns `true` if a load for `texture` is in flight.
    pub fn is_loading(&self, texture: TextureId) -> bool {
        self.active.values().any(|l| l.texture == texture)
    }

    /// A sender for completions, for fetchers living outside the queue.
    pub fn completion_sender(&self) -> flume::Sender<FetchCompletion> {
        self.sender.clone()
    }

    fn next_id(&mut self) -> RequestId {
        let id = RequestId(self.next_request);
        self.next_request += 1;
        id
    }

    /// Starts loading `url` into `texture`.
    pub fn request(
        &mut self,
        texture: TextureId,
        url: &str,
        options: TextureLoadOptions,
        on_error: Option<ErrorCallback>,
        caps: &Capabilities,
    ) -> TextureLoadFuture {
        self.enqueue(texture, url, options, on_error, None, caps)
    }

    /// Starts decoding `data` into `texture`. `name` stands in for the URL in
    /// logs and loader selection.
    pub fn request_from_buffer(
        &mut self,
        texture: TextureId,
        name: &str,
        data: Vec<u8>,
        options: TextureLoadOptions,
        on_error: Option<ErrorCallback>,
        caps: &Capabilities,
    ) -> TextureLoadFuture {
        self.enqueue(texture, name, options, on_error, Some(data), caps)
    }

    fn enqueue(
        &mut self,
        texture: TextureId,
        url: &str,
        options: TextureLoadOptions,
        on_error: Option<ErrorCallback>,
        inline: Option<Vec<u8>>,
        caps: &Capabilities,
    ) -> TextureLoadFuture {
        let (future, promise) = pair();
        let load = ActiveLoad {
            texture,
            machine: LoadMachine::new(url),
            options,
            waiters: vec![promise],
            on_error,
            inline,
        };
        self.dispatch(load, caps);
        future
    }

    /// Adds a waiter to the load in flight for `texture`, if any.
    pub fn subscribe(&mut self, texture: TextureId) -> Option<TextureLoadFuture> {
        let load = self.active.values_mut().find(|l| l.texture == texture)?;
        let (future, promise) = pair();
        load.waiters.push(promise);
        Some(future)
    }

    /// Picks a loader for the current attempt and starts retrieving bytes.
    fn dispatch(&mut self, mut load: ActiveLoad, caps: &Capabilities) {
        let id = self.next_id();
        let url = load.machine.url().to_string();
        let extension = load.extension();
        let loader = self
            .loaders
            .iter()
            .enumerate()
            .position(|(i, l)| !load.machine.is_excluded(i) && l.can_load(&extension, None, caps));
        let fetch_url = match loader {
            Some(index) => self.loaders[index].transform_url(&url, caps),
            None => url.clone(),
        };
        load.machine.start_loading(loader);
        let inline = load.inline.take();
        self.active.insert(id, load);

        let completion = if let Some(bytes) = inline {
            Some(Ok(bytes))
        } else if data_uri::is_data_uri(&fetch_url) {
            Some(data_uri::decode_data_uri(&fetch_url))
        } else {
            None
        };
        if let Some(result) = completion {
            // Inline payloads still complete through the channel, on the next poll.
            let _ = self.sender.send(FetchCompletion { id, result });
            return;
        }
        match self.fetcher.as_mut() {
            Some(fetcher) => {
                log::trace!("Fetching '{fetch_url}' ({id:?})");
                fetcher.fetch(
                    FetchRequest {
                        id,
                        url: fetch_url,
                    },
                    self.sender.clone(),
                );
            }
            None => {
                let _ = self.sender.send(FetchCompletion {
                    id,
                    result: Err("no fetcher is configured".to_string()),
                });
            }
        }
    }

    /// Drains fetch completions, decodes and uploads them, and runs fallback
    /// chains. Returns the number of completions handled.
    pub fn poll(&mut self, caps: &Capabilities, target: &mut dyn UploadTarget) -> usize {
        self.drop_abandoned(target);
        let mut handled = 0;
        while let Ok(completion) = self.receiver.try_recv() {
            self.complete(completion, caps, target);
            handled += 1;
        }
        handled
    }

    /// Aborts loads whose waiters all cancelled or whose texture was released.
    fn drop_abandoned(&mut self, target: &mut dyn UploadTarget) {
        let abandoned: Vec<RequestId> = self
            .active
            .iter()
            .filter(|(_, l)| l.all_cancelled() || !target.is_alive(l.texture))
            .map(|(id, _)| *id)
            .collect();
        for id in abandoned {
            if let Some(mut load) = self.active.remove(&id) {
                if let Some(fetcher) = self.fetcher.as_mut() {
                    fetcher.abort(id);
                }
                load.machine.cancel();
                log::debug!("Aborted load of '{}'", load.machine.url());
                if target.is_alive(load.texture) {
                    target.mark_failed(load.texture);
                }
                load.resolve_all(Err(LoadError::Cancelled));
            }
        }
    }

    fn complete(&mut self, completion: FetchCompletion, caps: &Capabilities, target: &mut dyn UploadTarget) {
        let Some(mut load) = self.active.remove(&completion.id) else {
            log::trace!("Ignoring completion of aborted request {:?}", completion.id);
            return;
        };
        if !target.is_alive(load.texture) {
            load.machine.cancel();
            load.resolve_all(Err(LoadError::Cancelled));
            return;
        }
        let url = load.machine.url().to_string();
        let bytes = match completion.result {
            Ok(bytes) => bytes,
            Err(message) => {
                self.handle_failure(load, LoadError::Network { url, message }, caps, target);
                return;
            }
        };

        let decoded = self.decode(&mut load, &bytes, caps);
        let decoded = match decoded {
            Ok(decoded) => decoded,
            Err(err) => {
                self.handle_failure(load, err, caps, target);
                return;
            }
        };
        load.machine.decoded();
        match target.upload(load.texture, decoded) {
            Ok(()) => {
                load.machine.ready();
                log::debug!("Loaded texture {:?} from '{url}'", load.texture);
                let texture = load.texture;
                load.resolve_all(Ok(texture));
            }
            Err(err) => {
                let reported = load.machine.fail(LoadError::Upload(err));
                self.finish_failed(load, reported, target);
            }
        }
    }

    fn decode(&self, load: &mut ActiveLoad, bytes: &[u8], caps: &Capabilities) -> Result<DecodedTexture, LoadError> {
        let url = load.machine.url().to_string();
        let index = match load.machine.loader() {
            Some(index) => Some(index),
            None => {
                let extension = load.extension();
                self.loaders.iter().enumerate().position(|(i, l)| {
                    !load.machine.is_excluded(i) && l.can_load(&extension, Some(bytes), caps)
                })
            }
        };
        load.machine.set_loader(index);
        let loader = match index {
            Some(index) => self.loaders.get(index).map(|l| l.as_ref()),
            None => self.default_loader.as_deref(),
        };
        let loader = loader.ok_or(LoadError::NoLoader { url: url.clone() })?;
        loader.load_data(bytes, caps).map_err(|e| LoadError::Decode {
            url,
            message: e.to_string(),
        })
    }

    fn handle_failure(
        &mut self,
        mut load: ActiveLoad,
        error: LoadError,
        caps: &Capabilities,
        target: &mut dyn UploadTarget,
    ) {
        let loader_fallback = load
            .machine
            .loader()
            .and_then(|i| self.loaders.get(i))
            .and_then(|l| l.fallback_texture_url(load.machine.url(), caps));
        let failed_url = load.machine.url().to_string();
        match load
            .machine
            .on_failure(error, loader_fallback, self.fallback_url.as_deref())
        {
            FailureAction::RetryWithLoaderFallback { url } => {
                log::warn!("Loading '{failed_url}' failed, retrying with '{url}'");
                self.dispatch(load, caps);
            }
            FailureAction::LoadGlobalFallback { url } => {
                log::warn!("Loading '{failed_url}' failed, using fallback texture '{url}'");
                self.dispatch(load, caps);
            }
            FailureAction::Abandon(original) => self.finish_failed(load, original, target),
        }
    }

    fn finish_failed(&mut self, mut load: ActiveLoad, error: LoadError, target: &mut dyn UploadTarget) {
        log::warn!("Texture load of '{}' failed: {error}", load.machine.original_url());
        target.mark_failed(load.texture);
        if let Some(callback) = load.on_error.take() {
            callback(&error);
        }
        load.resolve_all(Err(error));
    }

    /// Aborts the load in flight for `texture`, if any.
    pub fn abort_texture(&mut self, texture: TextureId) {
        let ids: Vec<RequestId> = self
            .active
            .iter()
            .filter(|(_, l)| l.texture == texture)
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            if let Some(mut load) = self.active.remove(&id) {
                if let Some(fetcher) = self.fetcher.as_mut() {
                    fetcher.abort(id);
                }
                load.machine.cancel();
                load.resolve_all(Err(LoadError::Cancelled));
            }
        }
    }

    /// Aborts every load in flight.
    pub fn abort_all(&mut self) {
        let count = self.active.len();
        for (id, mut load) in self.active.drain() {
            if let Some(fetcher) = self.fetcher.as_mut() {
                fetcher.abort(id);
            }
            load.machine.cancel();
            load.resolve_all(Err(LoadError::Cancelled));
        }
        while self.receiver.try_recv().is_ok() {}
        if count > 0 {
            log::debug!("Aborted {count} texture loads");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loading::ktx::tests::ktx_bytes;
    use crate::loading::KtxLoader;
    use ember_core::renderer::{CompressedFormats, CpuImage, DecodeError};
    use ember_infra::fetch::MemoryFetcher;
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    /// Decodes payloads starting with `RAW` into a 1x1 image.
    #[derive(Debug)]
    struct RawLoader;

    impl TextureLoader for RawLoader {
        fn name(&self) -> &str {
            "raw"
        }

        fn can_load(&self, extension: &str, data: Option<&[u8]>, _caps: &Capabilities) -> bool {
            extension == ".raw" || data.is_some_and(|d| d.starts_with(b"RAW"))
        }

        fn load_data(&self, data: &[u8], _caps: &Capabilities) -> Result<DecodedTexture, DecodeError> {
            if !data.starts_with(b"RAW") {
                return Err("not a raw payload".into());
            }
            Ok(DecodedTexture::Pixels(CpuImage::rgba8(1, 1, vec![0; 4])))
        }
    }

    #[derive(Default)]
    struct Target {
        uploaded: Vec<(TextureId, DecodedTexture)>,
        failed: Vec<TextureId>,
        released: HashSet<TextureId>,
    }

    impl UploadTarget for Target {
        fn upload(&mut self, texture: TextureId, decoded: DecodedTexture) -> Result<(), ResourceError> {
            self.uploaded.push((texture, decoded));
            Ok(())
        }

        fn mark_failed(&mut self, texture: TextureId) {
            self.failed.push(texture);
        }

        fn is_alive(&self, texture: TextureId) -> bool {
            !self.released.contains(&texture)
        }
    }

    fn queue_with(fetcher: &MemoryFetcher) -> LoadQueue {
        let mut queue = LoadQueue::new();
        queue.set_default_loader(Box::new(RawLoader));
        queue.set_fetcher(Box::new(fetcher.clone()));
        queue
    }

    fn error_sink() -> (Rc<RefCell<Vec<LoadError>>>, ErrorCallback) {
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = errors.clone();
        (errors, Box::new(move |e: &LoadError| sink.borrow_mut().push(e.clone())))
    }

    #[test]
    fn successful_load_uploads_and_resolves() {
        let fetcher = MemoryFetcher::new();
        fetcher.insert("a.raw", b"RAW".to_vec());
        let mut queue = queue_with(&fetcher);
        let caps = Capabilities::default();
        let mut target = Target::default();

        let future = queue.request(TextureId(0), "a.raw", Default::default(), None, &caps);
        assert!(!future.is_resolved());
        assert_eq!(queue.poll(&caps, &mut target), 1);
        assert_eq!(future.try_result(), Some(Ok(TextureId(0))));
        assert_eq!(target.uploaded.len(), 1);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn data_uris_are_decoded_without_fetching() {
        let fetcher = MemoryFetcher::new();
        let mut queue = queue_with(&fetcher);
        let caps = Capabilities::default();
        let mut target = Target::default();

        let future = queue.request(TextureId(1), "data:;base64,UkFX", Default::default(), None, &caps);
        queue.poll(&caps, &mut target);
        assert_eq!(future.try_result(), Some(Ok(TextureId(1))));
        assert!(fetcher.requested_urls().is_empty());
    }

    #[test]
    fn buffers_are_decoded_inline() {
        let fetcher = MemoryFetcher::new();
        let mut queue = queue_with(&fetcher);
        let caps = Capabilities::default();
        let mut target = Target::default();

        let future = queue.request_from_buffer(
            TextureId(2),
            "buffer",
            b"RAW!".to_vec(),
            Default::default(),
            None,
            &caps,
        );
        queue.poll(&caps, &mut target);
        assert_eq!(future.try_result(), Some(Ok(TextureId(2))));
    }

    #[test]
    fn exhausted_fallbacks_report_the_original_error_once() {
        let fetcher = MemoryFetcher::new();
        let mut queue = queue_with(&fetcher);
        queue.set_fallback_url(Some("fallback.raw".into()));
        let caps = Capabilities::default();
        let mut target = Target::default();
        let (errors, on_error) = error_sink();

        let future = queue.request(TextureId(3), "missing.raw", Default::default(), Some(on_error), &caps);
        while queue.pending() > 0 {
            queue.poll(&caps, &mut target);
        }

        assert_eq!(fetcher.requested_urls(), vec!["missing.raw", "fallback.raw"]);
        let errors = errors.borrow();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("missing.raw"));
        assert_eq!(future.try_result(), Some(Err(errors[0].clone())));
        assert_eq!(target.failed, vec![TextureId(3)]);
    }

    #[test]
    fn global_fallback_rescues_a_failed_load() {
        let fetcher = MemoryFetcher::new();
        fetcher.insert("fallback.raw", b"RAW".to_vec());
        let mut queue = queue_with(&fetcher);
        queue.set_fallback_url(Some("fallback.raw".into()));
        let caps = Capabilities::default();
        let mut target = Target::default();
        let (errors, on_error) = error_sink();

        let future = queue.request(TextureId(4), "missing.raw", Default::default(), Some(on_error), &caps);
        while queue.pending() > 0 {
            queue.poll(&caps, &mut target);
        }
        assert_eq!(future.try_result(), Some(Ok(TextureId(4))));
        assert!(errors.borrow().is_empty());
    }

    #[test]
    fn loader_fallback_retries_without_that_loader() {
        let fetcher = MemoryFetcher::new();
        fetcher.insert("wood.raw", b"RAW".to_vec());
        let mut queue = queue_with(&fetcher);
        queue.register_loader(Box::new(KtxLoader::with_variant_selection()));
        let caps = Capabilities {
            compressed_formats: CompressedFormats::S3TC,
            ..Default::default()
        };
        let mut target = Target::default();

        let future = queue.request(TextureId(5), "wood.raw", Default::default(), None, &caps);
        while queue.pending() > 0 {
            queue.poll(&caps, &mut target);
        }
        assert_eq!(fetcher.requested_urls(), vec!["wood-dxt.ktx", "wood.raw"]);
        assert_eq!(future.try_result(), Some(Ok(TextureId(5))));
    }

    #[test]
    fn ktx_variant_is_used_when_present() {
        let fetcher = MemoryFetcher::new();
        fetcher.insert("wood-dxt.ktx", ktx_bytes(0x83F0, 4, 4, &[vec![0; 8]]));
        let mut queue = queue_with(&fetcher);
        queue.register_loader(Box::new(KtxLoader::with_variant_selection()));
        let caps = Capabilities {
            compressed_formats: CompressedFormats::S3TC,
            ..Default::default()
        };
        let mut target = Target::default();

        queue.request(TextureId(6), "wood.png", Default::default(), None, &caps);
        queue.poll(&caps, &mut target);
        assert!(matches!(target.uploaded[0].1, DecodedTexture::Compressed(_)));
    }

    #[test]
    fn undecodable_payload_without_loader_fails() {
        let fetcher = MemoryFetcher::new();
        fetcher.insert("a.bin", b"????".to_vec());
        let mut queue = LoadQueue::new();
        queue.set_fetcher(Box::new(fetcher.clone()));
        let caps = Capabilities::default();
        let mut target = Target::default();

        let future = queue.request(TextureId(7), "a.bin", Default::default(), None, &caps);
        queue.poll(&caps, &mut target);
        assert_eq!(
            future.try_result(),
            Some(Err(LoadError::NoLoader { url: "a.bin".into() }))
        );
    }

    #[test]
    fn cancelling_every_waiter_aborts_the_fetch() {
        let fetcher = MemoryFetcher::deferred();
        fetcher.insert("slow.raw", b"RAW".to_vec());
        let mut queue = queue_with(&fetcher);
        let caps = Capabilities::default();
        let mut target = Target::default();

        let first = queue.request(TextureId(8), "slow.raw", Default::default(), None, &caps);
        let second = queue.subscribe(TextureId(8)).unwrap();
        first.cancel();
        queue.poll(&caps, &mut target);
        assert_eq!(queue.pending(), 1);

        second.cancel();
        queue.poll(&caps, &mut target);
        assert_eq!(queue.pending(), 0);
        assert_eq!(fetcher.aborted_requests().len(), 1);

        fetcher.flush();
        queue.poll(&caps, &mut target);
        assert!(target.uploaded.is_empty());
    }

    #[test]
    fn released_textures_drop_their_load() {
        let fetcher = MemoryFetcher::deferred();
        fetcher.insert("slow.raw", b"RAW".to_vec());
        let mut queue = queue_with(&fetcher);
        let caps = Capabilities::default();
        let mut target = Target::default();

        let future = queue.request(TextureId(9), "slow.raw", Default::default(), None, &caps);
        target.released.insert(TextureId(9));
        fetcher.flush();
        queue.poll(&caps, &mut target);
        assert_eq!(future.try_result(), Some(Err(LoadError::Cancelled)));
        assert!(target.uploaded.is_empty());
    }

    #[test]
    fn abort_all_resolves_every_waiter() {
        let fetcher = MemoryFetcher::deferred();
        let mut queue = queue_with(&fetcher);
        let caps = Capabilities::default();
        let a = queue.request(TextureId(10), "a.raw", Default::default(), None, &caps);
        let b = queue.request(TextureId(11), "b.raw", Default::default(), None, &caps);
        queue.abort_all();
        assert_eq!(a.try_result(), Some(Err(LoadError::Cancelled)));
        assert_eq!(b.try_result(), Some(Err(LoadError::Cancelled)));
        assert_eq!(fetcher.aborted_requests().len(), 2);
    }
}
