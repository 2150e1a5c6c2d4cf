//! Edge proxy: forwards a request to a fixed upstream picked by numeric id,
//! rewriting origin headers on the way out and adding CORS headers on the way back.
//! [`Proxy::download`] is the GET-only variant that fetches an arbitrary video
//! URL and hands it back as an attachment.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_RANGES, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, CONTENT_DISPOSITION,
    CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, HOST, ORIGIN, RANGE, REFERER, TRANSFER_ENCODING, USER_AGENT,
};
use reqwest::{Method, StatusCode};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type, Authorization";
const PREFLIGHT_MAX_AGE: &str = "86400";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";

const DOWNLOAD_METHODS: &str = "GET, OPTIONS";
const DOWNLOAD_ALLOWED_HEADERS: &str = "Content-Type";
const DOWNLOAD_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const DOWNLOAD_REFERER: &str = "https://www.douyin.com/";
const DEFAULT_VIDEO_TYPE: &str = "video/mp4";

const BUILTIN_ROUTES: &[(&str, &str)] = &[
    ("1", "https://cloudflare-ai-test.20200511.xyz/"),
    ("2", "https://q.juxw.com/api/jx.php?url="),
];

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Proxy ID \"{0}\" not found in configuration")]
    UnknownId(String),
    #[error("proxy route '{id}' has an invalid upstream: {reason}")]
    InvalidUpstream { id: String, reason: String },
    #[error("{0}")]
    Upstream(String),
    #[error("method {0} is not allowed, use GET")]
    MethodNotAllowed(Method),
    #[error("Missing {0} parameter")]
    MissingParam(&'static str),
    #[error("invalid {name} parameter: {reason}")]
    InvalidParam { name: &'static str, reason: String },
    #[error("{0}")]
    Download(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::UnknownId(_) => StatusCode::NOT_FOUND,
            ProxyError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::MissingParam(_) | ProxyError::InvalidParam { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn title(&self) -> String {
        match self {
            ProxyError::UnknownId(_) => "Invalid proxy ID".to_string(),
            ProxyError::MethodNotAllowed(_) => "Only GET method is allowed".to_string(),
            ProxyError::MissingParam(_) | ProxyError::InvalidParam { .. } => self.to_string(),
            ProxyError::Download(_) => "Failed to download video".to_string(),
            ProxyError::InvalidUpstream { .. } | ProxyError::Upstream(_) => "Proxy error".to_string(),
        }
    }

    /// JSON error body with permissive CORS, as served to browsers.
    pub fn to_response(&self) -> ProxyResponse {
        let body = json!({ "error": self.title(), "message": self.to_string() });
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        ProxyResponse { status: self.status(), headers, body: body.to_string().into_bytes() }
    }
}

/// Route table, id -> upstream base URL.
#[derive(Debug, Clone)]
pub struct ProxyTable {
    routes: BTreeMap<String, Url>,
}

impl ProxyTable {
    pub fn new<I, K, V>(routes: I) -> Result<Self, ProxyError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut out = BTreeMap::new();
        for (id, upstream) in routes {
            let id = id.into();
            let url = parse_upstream(&id, upstream.as_ref())?;
            out.insert(id, url);
        }
        Ok(Self { routes: out })
    }

    pub fn builtin() -> Result<Self, ProxyError> {
        Self::new(BUILTIN_ROUTES.iter().copied())
    }

    /// Built-in routes with `extra` added or replacing by id.
    pub fn with_routes(mut self, extra: &BTreeMap<String, String>) -> Result<Self, ProxyError> {
        for (id, upstream) in extra {
            self.routes.insert(id.clone(), parse_upstream(id, upstream)?);
        }
        Ok(self)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    pub fn upstream(&self, id: &str) -> Option<&Url> {
        self.routes.get(id)
    }

    /// Upstream origin and path, followed by the incoming query string. The
    /// upstream's own query is replaced.
    pub fn target_url(&self, id: &str, incoming_query: Option<&str>) -> Result<Url, ProxyError> {
        let base = self.routes.get(id).ok_or_else(|| ProxyError::UnknownId(id.to_string()))?;
        let mut target = base.clone();
        let query = incoming_query.map(|q| q.trim_start_matches('?')).filter(|q| !q.is_empty());
        target.set_query(query);
        target.set_fragment(None);
        Ok(target)
    }
}

fn parse_upstream(id: &str, upstream: &str) -> Result<Url, ProxyError> {
    let invalid = |reason: String| ProxyError::InvalidUpstream { id: id.to_string(), reason };
    let url = Url::parse(upstream).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(invalid("expected an http(s) URL with a host".to_string())),
    }
}

/// Incoming headers rewritten to look like a same-origin request to `target`.
pub fn upstream_headers(incoming: &HeaderMap, target: &Url) -> HeaderMap {
    let mut headers = incoming.clone();
    // reqwest computes these for the outgoing body
    headers.remove(CONTENT_LENGTH);
    headers.remove(TRANSFER_ENCODING);

    let origin = target.origin().ascii_serialization();
    set_header(&mut headers, ORIGIN, &origin);
    set_header(&mut headers, REFERER, &format!("{origin}/"));
    if let Some(host) = target.host_str() {
        let host = match target.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        set_header(&mut headers, HOST, &host);
    }
    if !headers.contains_key(USER_AGENT) {
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
    }
    headers
}

fn set_header(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(_) => warn!(header = %name, value, "skipping unrepresentable header value"),
    }
}

pub fn add_cors_headers(headers: &mut HeaderMap) {
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOWED_METHODS));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOWED_HEADERS));
}

/// Response to an OPTIONS preflight.
pub fn preflight() -> ProxyResponse {
    let mut headers = HeaderMap::new();
    add_cors_headers(&mut headers);
    headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(PREFLIGHT_MAX_AGE));
    ProxyResponse { status: StatusCode::OK, headers, body: Vec::new() }
}

fn add_download_cors(headers: &mut HeaderMap) {
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(DOWNLOAD_METHODS));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(DOWNLOAD_ALLOWED_HEADERS));
}

/// OPTIONS preflight for the download endpoint.
pub fn download_preflight() -> ProxyResponse {
    let mut headers = HeaderMap::new();
    add_download_cors(&mut headers);
    headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(PREFLIGHT_MAX_AGE));
    ProxyResponse { status: StatusCode::OK, headers, body: Vec::new() }
}

/// Response headers for a proxied download. Only the content type (default
/// `video/mp4`), length and range headers survive from upstream. The file
/// name is form-encoded into an attachment disposition.
pub fn download_headers(upstream: &HeaderMap, filename: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(name) = filename.filter(|n| !n.is_empty()) {
        let encoded: String = url::form_urlencoded::byte_serialize(name.as_bytes()).collect();
        set_header(&mut headers, CONTENT_DISPOSITION, &format!("attachment; filename=\"{encoded}\""));
    }
    let content_type = upstream
        .get(CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_VIDEO_TYPE));
    headers.insert(CONTENT_TYPE, content_type);
    for name in [CONTENT_LENGTH, ACCEPT_RANGES, CONTENT_RANGE] {
        if let Some(value) = upstream.get(&name) {
            headers.insert(name, value.clone());
        }
    }
    add_download_cors(&mut headers);
    headers
}

/// `video_url` (required, http(s)) and `filename` from a download query string.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadParams {
    pub video_url: Url,
    pub filename: Option<String>,
}

impl DownloadParams {
    pub fn from_query(query: Option<&str>) -> Result<Self, ProxyError> {
        let query = query.unwrap_or_default().trim_start_matches('?');
        let mut video_url = None;
        let mut filename = None;
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "video_url" if !value.is_empty() => video_url = Some(value.into_owned()),
                "filename" if !value.is_empty() => filename = Some(value.into_owned()),
                _ => {}
            }
        }
        let raw = video_url.ok_or(ProxyError::MissingParam("video_url"))?;
        let invalid = |reason: String| ProxyError::InvalidParam { name: "video_url", reason };
        let video_url = Url::parse(&raw).map_err(|e| invalid(e.to_string()))?;
        if !matches!(video_url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme `{}`", video_url.scheme())));
        }
        Ok(Self { video_url, filename })
    }
}

#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Query string without the leading `?`.
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl ProxyRequest {
    pub fn get(query: Option<&str>) -> Self {
        Self { method: Method::GET, query: query.map(str::to_string), headers: HeaderMap::new(), body: None }
    }
}

#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

pub struct Proxy {
    table: ProxyTable,
    client: reqwest::Client,
}

impl Proxy {
    pub fn new(table: ProxyTable, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building proxy HTTP client")?;
        Ok(Self { table, client })
    }

    pub fn table(&self) -> &ProxyTable {
        &self.table
    }

    /// Always produces a response; failures become JSON error bodies.
    pub async fn forward(&self, id: &str, req: ProxyRequest) -> ProxyResponse {
        if req.method == Method::OPTIONS {
            return preflight();
        }
        match self.try_forward(id, req).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(proxy = id, error = %e, "proxy request failed");
                e.to_response()
            }
        }
    }

    /// GET `video_url` with browser-like headers and return it as an attachment.
    /// A `Range` header on the request is passed through.
    pub async fn download(&self, req: ProxyRequest) -> ProxyResponse {
        if req.method == Method::OPTIONS {
            return download_preflight();
        }
        match self.try_download(req).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, "download failed");
                e.to_response()
            }
        }
    }

    async fn try_download(&self, req: ProxyRequest) -> Result<ProxyResponse, ProxyError> {
        if req.method != Method::GET {
            return Err(ProxyError::MethodNotAllowed(req.method));
        }
        let params = DownloadParams::from_query(req.query.as_deref())?;
        debug!(url = %params.video_url, "downloading");

        let mut builder = self
            .client
            .get(params.video_url.clone())
            .header(USER_AGENT, DOWNLOAD_USER_AGENT)
            .header(REFERER, DOWNLOAD_REFERER)
            .header(ACCEPT, "*/*");
        if let Some(range) = req.headers.get(RANGE) {
            builder = builder.header(RANGE, range.clone());
        }
        let upstream = builder.send().await.map_err(|e| ProxyError::Download(e.to_string()))?;

        let status = upstream.status();
        if !status.is_success() {
            return Err(ProxyError::Download(format!("upstream answered HTTP {status}")));
        }
        let headers = download_headers(upstream.headers(), params.filename.as_deref());
        let body = upstream.bytes().await.map_err(|e| ProxyError::Download(e.to_string()))?;
        Ok(ProxyResponse { status, headers, body: body.to_vec() })
    }

    async fn try_forward(&self, id: &str, req: ProxyRequest) -> Result<ProxyResponse, ProxyError> {
        let target = self.table.target_url(id, req.query.as_deref())?;
        let headers = upstream_headers(&req.headers, &target);
        debug!(proxy = id, method = %req.method, %target, "forwarding");

        let mut builder = self.client.request(req.method, target).headers(headers);
        if let Some(body) = req.body {
            builder = builder.body(body);
        }
        let upstream = builder.send().await.map_err(|e| ProxyError::Upstream(e.to_string()))?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        headers.remove(TRANSFER_ENCODING);
        add_cors_headers(&mut headers);
        let body = upstream.bytes().await.map_err(|e| ProxyError::Upstream(e.to_string()))?;
        Ok(ProxyResponse { status, headers, body: body.to_vec() })
    }
}
