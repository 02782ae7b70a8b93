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

//! Asynchronous texture loading.
//!
//! A load walks `Requested -> Loading -> Decoded -> Ready` in a
//! [`LoadMachine`]; fetch completions arrive through a `flume` channel and
//! are consumed on the engine thread by [`LoadQueue::poll`].

pub mod data_uri;
pub mod future;
pub mod ktx;
pub mod machine;
pub mod queue;

pub use self::future::{LoadResult, TextureLoadFuture};
pub use self::ktx::KtxLoader;
pub use self::machine::{FailureAction, LoadMachine, LoadPhase};
pub use self::queue::{ErrorCallback, LoadQueue, UploadTarget};

use ember_core::renderer::SamplingMode;

/// Options of a texture load. They take part in deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureLoadOptions {
    /// Skip mip generation.
    pub no_mipmap: bool,
    /// Flip rows on upload.
    pub invert_y: bool,
    /// Sampling mode of the texture.
    pub sampling_mode: SamplingMode,
    /// Extension used for loader selection instead of the URL's, e.g. for
    /// data URIs and buffers.
    pub forced_extension: Option<String>,
}

impl Default for TextureLoadOptions {
    fn default() -> Self {
        Self {
            no_mipmap: false,
            invert_y: true,
            sampling_mode: SamplingMode::Trilinear,
            forced_extension: None,
        }
    }
}

impl TextureLoadOptions {
    /// The deduplication key of a load of `url` with these options.
    pub fn cache_key(&self, url: &str) -> String {
        format!(
            "{url}|{}|{}|{:?}",
            self.no_mipmap, self.invert_y, self.sampling_mode
        )
    }

    /// The extension used to select a loader for `url`.
    pub fn extension_for(&self, url: &str) -> String {
        match &self.forced_extension {
            Some(ext) if ext.starts_with('.') => ext.to_ascii_lowercase(),
            Some(ext) => format!(".{}", ext.to_ascii_lowercase()),
            None => extension_of(url),
        }
    }
}

/// The lowercase extension of `url` with its leading dot, ignoring query
/// strings and fragments. Data URIs have none.
pub fn extension_of(url: &str) -> String {
    if data_uri::is_data_uri(url) {
        return String::new();
    }
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.rsplit('/').next().unwrap_or(path);
    match file.rfind('.') {
        Some(dot) => file[dot..].to_ascii_lowercase(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_ignore_queries_and_directories() {
        assert_eq!(extension_of("textures/Wood.PNG?v=2"), ".png");
        assert_eq!(extension_of("assets.v2/readme"), "");
        assert_eq!(extension_of("data:image/png;base64,AAAA"), "");
        assert_eq!(extension_of("a.ktx#frag"), ".ktx");
    }

    #[test]
    fn forced_extension_wins() {
        let options = TextureLoadOptions {
            forced_extension: Some("KTX".into()),
            ..Default::default()
        };
        assert_eq!(options.extension_for("data:;base64,AAAA"), ".ktx");
    }

    #[test]
    fn cache_key_covers_options() {
        let a = TextureLoadOptions::default();
        let b = TextureLoadOptions {
            invert_y: false,
            ..Default::default()
        };
        assert_ne!(a.cache_key("x.png"), b.cache_key("x.png"));
        assert_eq!(a.cache_key("x.png"), a.clone().cache_key("x.png"));
    }
}
