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

//! Step-by-step engine construction.

use super::Engine;
use anyhow::{Context, Result};
use ember_core::math::Extent2D;
use ember_core::renderer::{ContextProvider, Fetcher, FrameScheduler, GraphicsApi, TextureLoader};
use ember_core::{EngineOptions, EngineRegistry};
use ember_device::{DeviceOptions, GpuDevice};
use ember_infra::{FileFetcher, ImageLoader, ManualScheduler};
use std::path::PathBuf;
use std::sync::Arc;

/// Where the engine gets its graphics context from.
pub enum ContextSource {
    /// A surface that hands out contexts, and can hand out a fresh one after
    /// a loss.
    Surface(Box<dyn ContextProvider>),
    /// A context created by the host. It is never re-acquired; restores wait
    /// for this same context to come back.
    Context {
        /// The native context.
        api: Box<dyn GraphicsApi>,
        /// Size of the drawing buffer.
        size: Extent2D,
    },
}

impl ContextSource {
    /// Wraps a surface.
    pub fn surface(provider: impl ContextProvider + 'static) -> Self {
        Self::Surface(Box::new(provider))
    }

    /// Wraps an existing context of the given size.
    pub fn context(api: impl GraphicsApi + 'static, size: Extent2D) -> Self {
        Self::Context {
            api: Box::new(api),
            size,
        }
    }
}

impl std::fmt::Debug for ContextSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Surface(provider) => f.debug_tuple("Surface").field(provider).finish(),
            Self::Context { size, .. } => f.debug_struct("Context").field("size", size).finish(),
        }
    }
}

/// Builds an [`Engine`].
///
/// Anything not configured falls back to a default: default options, a
/// private registry, a [`ManualScheduler`], and the [`ImageLoader`] as the
/// decoder of last resort.
///
/// # Example
///
/// ```rust
/// use ember_core::math::Extent2D;
/// use ember_infra::{HeadlessConfig, HeadlessProvider};
/// use ember_sdk::{ContextSource, EngineBuilder};
///
/// let provider = HeadlessProvider::new(HeadlessConfig::version_2(), Extent2D::new(640, 480));
/// let engine = EngineBuilder::new(ContextSource::surface(provider))
///     .label("preview")
///     .build()
///     .unwrap();
/// assert_eq!(engine.render_size(), Extent2D::new(640, 480));
/// ```
pub struct EngineBuilder {
    source: ContextSource,
    options: EngineOptions,
    registry: Option<Arc<EngineRegistry>>,
    scheduler: Option<Box<dyn FrameScheduler>>,
    loaders: Vec<Box<dyn TextureLoader>>,
    default_loader: Option<Box<dyn TextureLoader>>,
    fetcher: Option<Box<dyn Fetcher>>,
    label: String,
}

impl EngineBuilder {
    /// Starts a builder for the given context source.
    pub fn new(source: ContextSource) -> Self {
        Self {
            source,
            options: EngineOptions::default(),
            registry: None,
            scheduler: None,
            loaders: Vec::new(),
            default_loader: None,
            fetcher: None,
            label: "engine".to_string(),
        }
    }

    /// Sets the engine options.
    pub fn options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Registers the engine in a shared registry.
    pub fn registry(mut self, registry: Arc<EngineRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Sets the scheduler that drives the render loop.
    pub fn scheduler(mut self, scheduler: impl FrameScheduler + 'static) -> Self {
        self.scheduler = Some(Box::new(scheduler));
        self
    }

    /// Appends a texture loader plugin. Plugins are consulted in the order
    /// they were added.
    pub fn loader(mut self, loader: impl TextureLoader + 'static) -> Self {
        self.loaders.push(Box::new(loader));
        self
    }

    /// Replaces the decoder used when no plugin claims a payload.
    pub fn default_loader(mut self, loader: impl TextureLoader + 'static) -> Self {
        self.default_loader = Some(Box::new(loader));
        self
    }

    /// Sets the fetcher used for texture URLs.
    pub fn fetcher(mut self, fetcher: impl Fetcher + 'static) -> Self {
        self.fetcher = Some(Box::new(fetcher));
        self
    }

    /// Serves texture URLs from files under `root`.
    pub fn asset_root(self, root: impl Into<PathBuf>) -> Self {
        self.fetcher(FileFetcher::new(root))
    }

    /// Sets the label shown in the registry and in logs.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Acquires the context, probes it, and returns the running engine.
    pub fn build(self) -> Result<Engine> {
        let device_options = DeviceOptions::from(&self.options);
        let (mut device, size) = match self.source {
            ContextSource::Surface(provider) => {
                let device = GpuDevice::from_provider(provider, device_options)
                    .context("Failed to create the graphics device")?;
                let size = device.surface_size().unwrap_or_default();
                (device, size)
            }
            ContextSource::Context { api, size } => {
                (GpuDevice::from_context(api, device_options), size)
            }
        };

        for loader in self.loaders {
            device.register_loader(loader);
        }
        device.set_default_loader(
            self.default_loader
                .unwrap_or_else(|| Box::new(ImageLoader)),
        );
        if let Some(fetcher) = self.fetcher {
            device.set_fetcher(fetcher);
        }

        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(EngineRegistry::new()));
        let scheduler = self
            .scheduler
            .unwrap_or_else(|| Box::new(ManualScheduler::with_display_sync()));

        Ok(Engine::assemble(
            device,
            self.options,
            registry,
            scheduler,
            self.label,
            size,
        ))
    }
}
