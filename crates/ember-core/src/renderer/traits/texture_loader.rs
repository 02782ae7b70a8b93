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

use crate::renderer::api::DecodedTexture;
use crate::renderer::Capabilities;
use std::fmt::Debug;

/// The error type returned by [`TextureLoader::load_data`].
pub type DecodeError = Box<dyn std::error::Error + Send + Sync>;

/// A plugin that turns fetched bytes into texture data.
///
/// Loaders are consulted in registration order. A loader is selected by the
/// request's extension before fetching, and by content once bytes are
/// available. The default image decoder is used when no loader claims a
/// request.
pub trait TextureLoader: Debug {
    /// A short name used in logs.
    fn name(&self) -> &str;

    /// Returns `true` if this loader handles the request.
    ///
    /// `extension` is lowercase including the leading dot (`".ktx"`), or empty.
    /// `data` is `None` when the loader is consulted before fetching.
    fn can_load(&self, extension: &str, data: Option<&[u8]>, caps: &Capabilities) -> bool;

    /// Rewrites the URL before fetching, e.g. to select a device-specific variant.
    fn transform_url(&self, url: &str, _caps: &Capabilities) -> String {
        url.to_string()
    }

    /// An alternate URL to try when loading through this loader failed.
    fn fallback_texture_url(&self, _url: &str, _caps: &Capabilities) -> Option<String> {
        None
    }

    /// Decodes the fetched bytes.
    fn load_data(&self, data: &[u8], caps: &Capabilities) -> Result<DecodedTexture, DecodeError>;
}
