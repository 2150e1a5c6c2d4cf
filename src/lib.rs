pub mod cachebust;
pub mod catalog;
pub mod config;
pub mod dao;
pub mod db;
pub mod error;
pub mod fetch;
pub mod instance;
pub mod mapping;
pub mod path;
pub mod proxy;
pub mod resolver;
pub mod storage;
pub mod types;

// --- Library API for embedding ---

/// Convenience re-exports for embedders.
pub mod prelude {
    pub use crate::config::GalleryConfig;
    pub use crate::error::{ConfigError, ResolveError};
    pub use crate::fetch::{Fetch, HttpFetcher};
    pub use crate::instance::{Gallery, Outcome, Phase, Snapshot};
    pub use crate::path::ExtractionPath;
    pub use crate::resolver::Resolver;
    pub use crate::storage::{MemoryStore, SourceStore};
    pub use crate::types::{Envelope, FetchResult, Locator, MediaKind, ResponseMode, SourceDescriptor};
    pub use crate::Hub;
}

use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::config::{merge_sources, GalleryConfig};
use crate::db::Database;
use crate::instance::Gallery;
use crate::proxy::{Proxy, ProxyTable};
use crate::resolver::Resolver;
use crate::storage::SourceStore;
use crate::types::{FetchResult, MediaKind, SourceDescriptor};

/// Library entry point. Owns the configuration, a shared resolver and the
/// saved-source repository.
pub struct Hub {
    config: GalleryConfig,
    resolver: Arc<Resolver>,
    store: Arc<dyn SourceStore>,
}

impl Hub {
    /// HTTP resolver plus the SQLite store named by the config (or the default file).
    pub async fn connect(config: GalleryConfig) -> Result<Self> {
        let db = Database::open(config.database_url.as_deref()).await?;
        let resolver = Resolver::http(config.timeout())?;
        Ok(Self::new(config, Arc::new(resolver), Arc::new(db)))
    }

    pub fn new(config: GalleryConfig, resolver: Arc<Resolver>, store: Arc<dyn SourceStore>) -> Self {
        Self { config, resolver, store }
    }

    pub fn config(&self) -> &GalleryConfig { &self.config }
    pub fn resolver(&self) -> Arc<Resolver> { self.resolver.clone() }
    pub fn store(&self) -> &Arc<dyn SourceStore> { &self.store }

    /// Configured catalog followed by saved sources; a saved source replaces
    /// a catalog entry with the same id.
    pub async fn sources(&self, kind: Option<MediaKind>) -> Result<Vec<SourceDescriptor>> {
        let mut all = self.config.catalog()?;
        merge_sources(&mut all, self.store.list().await?);
        if let Some(k) = kind {
            all.retain(|s| s.kind == k);
        }
        Ok(all)
    }

    pub async fn find(&self, id: &str) -> Result<SourceDescriptor> {
        if let Some(saved) = self.store.load(id).await? {
            return Ok(saved);
        }
        self.config
            .catalog()?
            .into_iter()
            .find(|s| s.id == id)
            .ok_or_else(|| anyhow!("unknown source '{id}'"))
    }

    /// One-off resolution outside any gallery. The outer error is for lookup
    /// problems only; resolution failures come back inside the [`FetchResult`].
    pub async fn resolve(&self, id: &str) -> Result<FetchResult> {
        let source = self.find(id).await?;
        Ok(self.resolver.resolve(&source).await)
    }

    /// A fresh gallery instance over every source of `kind`.
    pub async fn gallery(&self, kind: MediaKind) -> Result<Gallery> {
        let sources = self.sources(Some(kind)).await?;
        Gallery::new(sources, self.resolver.clone())
    }

    pub async fn save_source(&self, source: &SourceDescriptor) -> Result<()> {
        self.store.save(source).await
    }

    pub async fn delete_source(&self, id: &str) -> Result<bool> {
        self.store.delete(id).await
    }

    /// Saved sources in save order, optionally of one kind.
    pub async fn saved_sources(&self, kind: Option<MediaKind>) -> Result<Vec<SourceDescriptor>> {
        match kind {
            Some(k) => self.store.list_of_kind(k).await,
            None => self.store.list().await,
        }
    }

    /// Forwarder over the built-in routes plus any configured ones.
    pub fn proxy(&self) -> Result<Proxy> {
        let table = ProxyTable::builtin()?.with_routes(&self.config.proxy)?;
        Proxy::new(table, self.config.timeout())
    }
}
