//! One gallery instance: an active source, the locator on display, and the
//! guard that keeps late results from overwriting newer selections.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, bail, Result};
use tracing::{debug, info, warn};

use crate::error::ResolveError;
use crate::resolver::Resolver;
use crate::types::{Locator, SourceDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Resolving,
    Resolved,
    Failed,
}

/// What happened to one trigger (initial load, refresh, or source switch).
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The locator is now on display.
    Applied(Locator),
    /// The previous locator (if any) stays on display.
    Failed(ResolveError),
    /// A newer trigger happened while this one was in flight; result dropped.
    Stale,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub active: String,
    pub phase: Phase,
    pub locator: Option<Locator>,
    pub last_error: Option<ResolveError>,
}

impl Snapshot {
    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Resolving
    }
}

struct Slot {
    active: usize,
    generation: u64,
    phase: Phase,
    locator: Option<Locator>,
    last_error: Option<ResolveError>,
}

pub struct Gallery {
    sources: Vec<SourceDescriptor>,
    resolver: Arc<Resolver>,
    slot: Mutex<Slot>,
}

impl Gallery {
    /// The first source starts out active. Ids must be unique.
    pub fn new(sources: Vec<SourceDescriptor>, resolver: Arc<Resolver>) -> Result<Self> {
        if sources.is_empty() {
            bail!("a gallery needs at least one source");
        }
        let mut seen = HashSet::new();
        if let Some(dup) = sources.iter().find(|s| !seen.insert(s.id.as_str())) {
            bail!("duplicate source id '{}'", dup.id);
        }
        let slot = Slot { active: 0, generation: 0, phase: Phase::Idle, locator: None, last_error: None };
        Ok(Self { sources, resolver, slot: Mutex::new(slot) })
    }

    /// Seed the display with a locator obtained elsewhere (e.g. a prior session).
    pub fn with_locator(self, locator: impl Into<Locator>) -> Self {
        self.lock().locator = Some(locator.into());
        self
    }

    pub fn sources(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    pub fn active(&self) -> &SourceDescriptor {
        &self.sources[self.lock().active]
    }

    pub fn snapshot(&self) -> Snapshot {
        let slot = self.lock();
        Snapshot {
            active: self.sources[slot.active].id.clone(),
            phase: slot.phase,
            locator: slot.locator.clone(),
            last_error: slot.last_error.clone(),
        }
    }

    /// Switch to `id` and resolve it.
    pub async fn select(&self, id: &str) -> Result<Outcome> {
        let index = self
            .sources
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| anyhow!("unknown source '{id}'"))?;
        Ok(self.trigger(index).await)
    }

    /// Resolve the active source again.
    pub async fn refresh(&self) -> Outcome {
        let index = self.lock().active;
        self.trigger(index).await
    }

    /// Resolve the first source once. Failures only get logged and leave an
    /// empty placeholder; the user retries by refreshing.
    pub async fn load_initial(&self) -> Option<Locator> {
        match self.trigger(0).await {
            Outcome::Applied(locator) => Some(locator),
            Outcome::Failed(e) => {
                warn!(source = e.source_id(), error = %e, "initial load failed");
                None
            }
            Outcome::Stale => None,
        }
    }

    async fn trigger(&self, index: usize) -> Outcome {
        let generation = {
            let mut slot = self.lock();
            slot.active = index;
            slot.generation += 1;
            slot.phase = Phase::Resolving;
            slot.generation
        };
        let source = &self.sources[index];
        debug!(source = %source.id, generation, "resolving");

        let result = self.resolver.resolve(source).await;

        let mut slot = self.lock();
        if slot.generation != generation {
            debug!(source = %source.id, generation, current = slot.generation, "discarding stale result");
            return Outcome::Stale;
        }
        match result {
            Ok(locator) => {
                info!(source = %source.id, %locator, "resolved");
                slot.phase = Phase::Resolved;
                slot.locator = Some(locator.clone());
                slot.last_error = None;
                Outcome::Applied(locator)
            }
            Err(e) => {
                warn!(source = %source.id, kind = e.kind(), error = %e, "resolution failed");
                slot.phase = Phase::Failed;
                slot.last_error = Some(e.clone());
                Outcome::Failed(e)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::ExtractionPath;
    use crate::resolver::testing::FakeFetch;
    use serde_json::json;

    const A: &str = "https://a.example/api";
    const B: &str = "https://b.example/api";

    fn source(id: &str, url: &str) -> SourceDescriptor {
        SourceDescriptor::structured(id, id, url, ExtractionPath::parse("data").unwrap())
    }

    fn gallery(fetch: Arc<FakeFetch>) -> Gallery {
        let resolver = Arc::new(Resolver::new(fetch));
        Gallery::new(vec![source("a", A), source("b", B)], resolver).unwrap()
    }

    #[test]
    fn rejects_empty_and_duplicate_sources() {
        let resolver = Arc::new(Resolver::new(Arc::new(FakeFetch::default())));
        assert!(Gallery::new(vec![], resolver.clone()).is_err());
        assert!(Gallery::new(vec![source("a", A), source("a", B)], resolver).is_err());
    }

    #[tokio::test]
    async fn starts_idle_on_first_source() {
        let g = gallery(Arc::new(FakeFetch::default()));
        let snap = g.snapshot();
        assert_eq!(snap.active, "a");
        assert_eq!(snap.phase, Phase::Idle);
        assert_eq!(snap.locator, None);
    }

    #[tokio::test]
    async fn select_applies_result() {
        let fetch = Arc::new(FakeFetch::default().with(B, json!({"code": 200, "data": "https://b/1.png"})));
        let g = gallery(fetch);
        let out = g.select("b").await.unwrap();
        assert_eq!(out, Outcome::Applied("https://b/1.png".into()));
        let snap = g.snapshot();
        assert_eq!(snap.active, "b");
        assert_eq!(snap.phase, Phase::Resolved);
        assert_eq!(snap.locator.as_deref(), Some("https://b/1.png"));
    }

    #[tokio::test]
    async fn unknown_source_is_an_error() {
        let g = gallery(Arc::new(FakeFetch::default()));
        assert!(g.select("nope").await.is_err());
        assert_eq!(g.snapshot().phase, Phase::Idle);
    }

    #[tokio::test]
    async fn failure_keeps_previous_locator() {
        let fetch = Arc::new(
            FakeFetch::default()
                .with(A, json!({"code": 200, "data": "https://a/1.png"}))
                .with(B, json!({"code": 429, "msg": "slow down"})),
        );
        let g = gallery(fetch);
        g.select("a").await.unwrap();
        let out = g.select("b").await.unwrap();
        assert!(matches!(out, Outcome::Failed(ResolveError::UpstreamStatus { ref message, .. }) if message == "slow down"));
        let snap = g.snapshot();
        assert_eq!(snap.phase, Phase::Failed);
        assert_eq!(snap.active, "b");
        assert_eq!(snap.locator.as_deref(), Some("https://a/1.png"));
        assert!(snap.last_error.is_some());
    }

    #[tokio::test]
    async fn empty_payload_keeps_previous_locator() {
        let fetch = Arc::new(
            FakeFetch::default()
                .with(A, json!({"code": 200, "data": "https://a/1.png"}))
                .with(B, json!({"code": 200, "data": ""})),
        );
        let g = gallery(fetch);
        g.select("a").await.unwrap();
        let out = g.select("b").await.unwrap();
        assert!(matches!(out, Outcome::Failed(ResolveError::Extraction { .. })));
        let snap = g.snapshot();
        assert_eq!(snap.phase, Phase::Failed);
        assert_eq!(snap.locator.as_deref(), Some("https://a/1.png"));
    }

    #[tokio::test]
    async fn late_result_for_older_selection_is_discarded() {
        let fetch = Arc::new(FakeFetch::default().with(B, json!({"code": 200, "data": "https://b/1.png"})));
        let release_a = fetch.gate(A);
        let g = gallery(fetch);

        let select_a = g.select("a");
        let rest = async {
            // let A reach its network await first
            tokio::task::yield_now().await;
            let b = g.select("b").await.unwrap();
            assert!(g.snapshot().locator.as_deref() == Some("https://b/1.png"));
            let _ = release_a.send(json!({"code": 200, "data": "https://a/late.png"}));
            b
        };
        let (a, b) = tokio::join!(select_a, rest);

        assert_eq!(a.unwrap(), Outcome::Stale);
        assert_eq!(b, Outcome::Applied("https://b/1.png".into()));
        let snap = g.snapshot();
        assert_eq!(snap.active, "b");
        assert_eq!(snap.locator.as_deref(), Some("https://b/1.png"));
        assert_eq!(snap.phase, Phase::Resolved);
    }

    #[tokio::test]
    async fn refresh_reuses_active_source() {
        let fetch = Arc::new(FakeFetch::default().with(A, json!({"code": 200, "data": "https://a/1.png"})));
        let g = gallery(fetch.clone());
        g.refresh().await;
        g.refresh().await;
        assert_eq!(fetch.calls.lock().unwrap().as_slice(), [A, A]);
    }

    #[tokio::test]
    async fn initial_load_swallows_failures() {
        let g = gallery(Arc::new(FakeFetch::default()));
        assert_eq!(g.load_initial().await, None);
        assert_eq!(g.snapshot().phase, Phase::Failed);

        let fetch = Arc::new(FakeFetch::default().with(A, json!({"code": 200, "data": "https://a/0.png"})));
        let g = gallery(fetch);
        assert_eq!(g.load_initial().await.as_deref(), Some("https://a/0.png"));
    }

    #[tokio::test]
    async fn seeded_locator_survives_failure() {
        let g = gallery(Arc::new(FakeFetch::default())).with_locator("https://seed/0.png");
        assert!(matches!(g.refresh().await, Outcome::Failed(_)));
        assert_eq!(g.snapshot().locator.as_deref(), Some("https://seed/0.png"));
    }
}
