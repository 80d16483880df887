//! Name to factory table for hosted renderers.

use std::collections::BTreeMap;

use tracing::{debug, warn};
use vulkanisch_core::{Error, Result};

use crate::backend::GpuBackend;
use crate::hosted::HostedRenderer;

/// Constructor of one hosted renderer variant.
pub type RendererFactory<B> = fn() -> Result<Box<dyn HostedRenderer<B>>>;

/// Table of hosted renderers, filled once at startup and read-only afterwards.
pub struct Registry<B: GpuBackend> {
    factories: BTreeMap<&'static str, RendererFactory<B>>,
}

impl<B: GpuBackend> Registry<B> {
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Add a variant. A second registration under the same name replaces the first.
    pub fn register(&mut self, name: &'static str, factory: RendererFactory<B>) {
        if self.factories.insert(name, factory).is_some() {
            warn!("Renderer '{}' registered twice, keeping the later one", name);
        } else {
            debug!("Registered renderer '{}'", name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Instantiate the renderer registered as `name`.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] for an unknown name; otherwise whatever the
    /// factory returns.
    pub fn create(&self, name: &str) -> Result<Box<dyn HostedRenderer<B>>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::config(format!("no renderer registered as '{name}'")))?;
        factory()
    }
}

impl<B: GpuBackend> Default for Registry<B> {
    fn default() -> Self {
        Self::new()
    }
}
