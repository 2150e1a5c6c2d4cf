//! Cache-defeating query parameters for raw endpoints.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

const STAMP_PARAM: &str = "_t";
const NONCE_PARAM: &str = "_r";
const NONCE_RANGE: u32 = 1_000_000;

/// Appends `_t=<millis>&_r=<random>` to endpoints. Stamps handed out by one
/// buster are strictly increasing, so consecutive calls never repeat a URL.
#[derive(Debug, Default)]
pub struct CacheBuster {
    last_stamp: AtomicU64,
}

impl CacheBuster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bust(&self, endpoint: &str) -> String {
        let stamp = self.next_stamp();
        let nonce = rand::rng().random_range(0..NONCE_RANGE);
        append_params(endpoint, stamp, nonce)
    }

    fn next_stamp(&self) -> u64 {
        let now = epoch_millis();
        let prev = self
            .last_stamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
            .unwrap_or_else(|last| last);
        now.max(prev + 1)
    }
}

pub fn append_params(endpoint: &str, stamp: u64, nonce: u32) -> String {
    let separator = if endpoint.ends_with('?') || endpoint.ends_with('&') {
        ""
    } else if endpoint.contains('?') {
        "&"
    } else {
        "?"
    };
    format!("{endpoint}{separator}{STAMP_PARAM}={stamp}&{NONCE_PARAM}={nonce}")
}

fn epoch_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
