use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cachebust::CacheBuster;
use crate::error::ResolveError;
use crate::fetch::{Fetch, HttpFetcher};
use crate::path::ExtractionPath;
use crate::types::{Envelope, FetchResult, ResponseMode, SourceDescriptor};

/// Turns a [`SourceDescriptor`] into a content locator.
pub struct Resolver {
    fetcher: Arc<dyn Fetch>,
    buster: CacheBuster,
    slow_warn: Duration,
}

impl Resolver {
    pub fn new(fetcher: Arc<dyn Fetch>) -> Self {
        Self { fetcher, buster: CacheBuster::new(), slow_warn: Duration::from_secs(5) }
    }

    /// Resolver backed by [`HttpFetcher`].
    pub fn http(timeout: Duration) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpFetcher::new(timeout)?)))
    }

    /// Never fails with anything but a [`ResolveError`]; raw sources never touch the network.
    pub async fn resolve(&self, source: &SourceDescriptor) -> FetchResult {
        match &source.mode {
            ResponseMode::Raw => {
                let locator = self.buster.bust(&source.endpoint);
                debug!(source = %source.id, %locator, "raw source resolved");
                Ok(locator)
            }
            ResponseMode::Structured { path, envelope } => {
                let start = Instant::now();
                let body = self.fetcher.fetch_json(&source.endpoint).await.map_err(|e| {
                    ResolveError::Network { source_id: source.id.clone(), message: format!("{e:#}") }
                });
                let elapsed = start.elapsed();
                if elapsed > self.slow_warn {
                    warn!(source = %source.id, ?elapsed, "slow upstream");
                }
                let result = body.and_then(|b| interpret(&source.id, path, envelope, &b));
                match &result {
                    Ok(locator) => debug!(source = %source.id, %locator, ?elapsed, "structured source resolved"),
                    Err(e) => debug!(source = %source.id, kind = e.kind(), error = %e, "resolution failed"),
                }
                result
            }
        }
    }
}

/// Apply the envelope and extraction path to an already parsed body.
pub fn interpret(source_id: &str, path: &ExtractionPath, envelope: &Envelope, body: &Value) -> FetchResult {
    envelope.check(body).map_err(|message| ResolveError::UpstreamStatus {
        source_id: source_id.to_string(),
        message,
    })?;
    match path.extract_str(body) {
        Ok(s) if !s.trim().is_empty() => Ok(s.to_string()),
        Ok(_) => {
            debug!(source = source_id, %path, "extracted value is blank");
            Err(ResolveError::Extraction { source_id: source_id.to_string(), path: path.to_string() })
        }
        Err(miss) => {
            debug!(source = source_id, %path, %miss, "extraction missed");
            Err(ResolveError::Extraction { source_id: source_id.to_string(), path: path.to_string() })
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeFetch;
    use super::*;
    use serde_json::json;

    const URL: &str = "https://api.example.com/pic";

    fn structured(path: &str) -> SourceDescriptor {
        SourceDescriptor::structured("pic", "Pic", URL, ExtractionPath::parse(path).unwrap())
            .with_envelope(Envelope::new("status", "ok", "msg"))
    }

    fn resolver(body: Value) -> (Arc<FakeFetch>, Resolver) {
        let fetch = Arc::new(FakeFetch::default().with(URL, body));
        (fetch.clone(), Resolver::new(fetch))
    }

    #[tokio::test]
    async fn returns_string_at_path() {
        let (_, r) = resolver(json!({"status": "ok", "data": {"inner": "https://x/y.png"}}));
        assert_eq!(r.resolve(&structured("data.inner")).await, Ok("https://x/y.png".to_string()));
    }

    #[tokio::test]
    async fn non_string_terminal_is_extraction_failure() {
        let (_, r) = resolver(json!({"status": "ok", "data": {"inner": 42}}));
        assert_eq!(
            r.resolve(&structured("data.inner")).await,
            Err(ResolveError::Extraction { source_id: "pic".into(), path: "data.inner".into() })
        );
    }

    #[tokio::test]
    async fn blank_string_is_extraction_failure() {
        for blank in ["", "   "] {
            let (_, r) = resolver(json!({"status": "ok", "data": {"inner": blank}}));
            assert_eq!(
                r.resolve(&structured("data.inner")).await,
                Err(ResolveError::Extraction { source_id: "pic".into(), path: "data.inner".into() })
            );
        }
    }

    #[tokio::test]
    async fn missing_intermediate_is_extraction_failure() {
        let (_, r) = resolver(json!({"status": "ok", "other": {"inner": "https://x/y.png"}}));
        let err = r.resolve(&structured("data.inner")).await.unwrap_err();
        assert_eq!(err.kind(), "extraction");
    }

    #[tokio::test]
    async fn upstream_failure_carries_message() {
        let (_, r) = resolver(json!({"status": "fail", "msg": "quota exceeded"}));
        assert_eq!(
            r.resolve(&structured("data.inner")).await,
            Err(ResolveError::UpstreamStatus { source_id: "pic".into(), message: "quota exceeded".into() })
        );
    }

    #[tokio::test]
    async fn fetch_error_is_network_failure() {
        let r = Resolver::new(Arc::new(FakeFetch::default()));
        let err = r.resolve(&structured("data")).await.unwrap_err();
        assert!(matches!(err, ResolveError::Network { ref message, .. } if message.contains("connection refused")));
    }

    #[tokio::test]
    async fn raw_sources_skip_the_network() {
        let (fetch, r) = resolver(json!({}));
        let src = SourceDescriptor::raw("yj", "yj", "https://api.example.com/xjj.php");
        let a = r.resolve(&src).await.unwrap();
        let b = r.resolve(&src).await.unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("https://api.example.com/xjj.php?_t="));
        assert!(fetch.calls.lock().unwrap().is_empty());
    }
}
