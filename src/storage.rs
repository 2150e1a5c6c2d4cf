use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{MediaKind, SourceDescriptor};

/// Repository for user-saved sources, injected wherever saved sources are read or written.
#[async_trait]
pub trait SourceStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<Option<SourceDescriptor>>;
    /// In save order; replacing a source keeps its position.
    async fn list(&self) -> Result<Vec<SourceDescriptor>>;

    async fn list_of_kind(&self, kind: MediaKind) -> Result<Vec<SourceDescriptor>> {
        let mut all = self.list().await?;
        all.retain(|s| s.kind == kind);
        Ok(all)
    }

    /// Insert, or replace the source with the same id.
    async fn save(&self, source: &SourceDescriptor) -> Result<()>;
    /// Returns whether a source was removed.
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// In-process store; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Vec<SourceDescriptor>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(&self, f: impl FnOnce(&mut Vec<SourceDescriptor>) -> T) -> T {
        let mut entries = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut entries)
    }
}

#[async_trait]
impl SourceStore for MemoryStore {
    async fn load(&self, id: &str) -> Result<Option<SourceDescriptor>> {
        Ok(self.with_entries(|e| e.iter().find(|s| s.id == id).cloned()))
    }

    async fn list(&self) -> Result<Vec<SourceDescriptor>> {
        Ok(self.with_entries(|e| e.clone()))
    }

    async fn save(&self, source: &SourceDescriptor) -> Result<()> {
        self.with_entries(|e| match e.iter_mut().find(|s| s.id == source.id) {
            Some(existing) => *existing = source.clone(),
            None => e.push(source.clone()),
        });
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.with_entries(|e| {
            let before = e.len();
            e.retain(|s| s.id != id);
            e.len() != before
        }))
    }
}
