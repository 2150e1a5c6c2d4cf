use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, ResolveError};
use crate::path::ExtractionPath;

/// A displayable content URL handed to an image/video element.
pub type Locator = String;

/// Outcome of one resolution attempt.
pub type FetchResult = Result<Locator, ResolveError>;

const DEFAULT_FAILURE_MESSAGE: &str = "request failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "image" | "img" | "picture" => Ok(Self::Image),
            "video" | "vid" => Ok(Self::Video),
            other => Err(anyhow!("unknown media kind `{}` (expected image, video)", other)),
        }
    }
}

/// Status conventions of a structured response.
///
/// Most upstream APIs wrap their payload as `{"code": 200, "msg": ..., "data": ...}`,
/// which is the default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Envelope {
    pub status_field: String,
    pub success: Value,
    pub message_field: String,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            status_field: "code".to_string(),
            success: Value::from(200),
            message_field: "msg".to_string(),
        }
    }
}

impl Envelope {
    pub fn new(status_field: impl Into<String>, success: impl Into<Value>, message_field: impl Into<String>) -> Self {
        Self {
            status_field: status_field.into(),
            success: success.into(),
            message_field: message_field.into(),
        }
    }

    /// `Ok(())` when the top-level status field equals `success`, otherwise
    /// the upstream message (or a generic one).
    pub fn check(&self, body: &Value) -> Result<(), String> {
        let status = body.get(&self.status_field);
        if status.is_some_and(|s| status_matches(s, &self.success)) {
            return Ok(());
        }
        let message = body
            .get(&self.message_field)
            .and_then(Value::as_str)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(DEFAULT_FAILURE_MESSAGE);
        Err(message.to_string())
    }
}

// 200 and 200.0 are the same status.
fn status_matches(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a == b || a.as_f64() == b.as_f64(),
        _ => actual == expected,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseMode {
    /// The endpoint itself serves the media; only cache-defeat parameters are added.
    Raw,
    /// The endpoint returns an envelope with the locator at `path`.
    Structured { path: ExtractionPath, envelope: Envelope },
}

/// One external endpoint and how to interpret it. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SourceRecord", into = "SourceRecord")]
pub struct SourceDescriptor {
    pub id: String,
    pub name: String,
    pub endpoint: String,
    pub kind: MediaKind,
    pub mode: ResponseMode,
}

impl SourceDescriptor {
    pub fn raw(id: impl Into<String>, name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            endpoint: endpoint.into(),
            kind: MediaKind::default(),
            mode: ResponseMode::Raw,
        }
    }

    pub fn structured(
        id: impl Into<String>,
        name: impl Into<String>,
        endpoint: impl Into<String>,
        path: ExtractionPath,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            endpoint: endpoint.into(),
            kind: MediaKind::default(),
            mode: ResponseMode::Structured { path, envelope: Envelope::default() },
        }
    }

    pub fn with_kind(mut self, kind: MediaKind) -> Self {
        self.kind = kind;
        self
    }

    /// Replace the envelope of a structured source; no-op for raw ones.
    pub fn with_envelope(mut self, envelope: Envelope) -> Self {
        if let ResponseMode::Structured { envelope: e, .. } = &mut self.mode {
            *e = envelope;
        }
        self
    }

    pub fn path(&self) -> Option<&ExtractionPath> {
        match &self.mode {
            ResponseMode::Structured { path, .. } => Some(path),
            ResponseMode::Raw => None,
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self.mode, ResponseMode::Raw)
    }

    /// Same checks a config file or saved row goes through: a non-blank,
    /// untrimmed id and an http(s) endpoint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_id(&self.id)?;
        validate_endpoint(&self.id, &self.endpoint)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeTag {
    #[serde(alias = "json")]
    Structured,
    #[serde(alias = "direct", alias = "redirect")]
    Raw,
}

/// Flat, serializable shape of a [`SourceDescriptor`] used by config files
/// and the saved-source table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: String,
    pub name: String,
    pub endpoint: String,
    #[serde(default)]
    pub kind: MediaKind,
    pub mode: ModeTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envelope: Option<Envelope>,
}

impl TryFrom<SourceRecord> for SourceDescriptor {
    type Error = ConfigError;

    fn try_from(r: SourceRecord) -> Result<Self, Self::Error> {
        let id = r.id.trim().to_string();
        validate_id(&id)?;
        validate_endpoint(&id, &r.endpoint)?;
        let mode = match (r.mode, r.path) {
            (ModeTag::Raw, None) => ResponseMode::Raw,
            (ModeTag::Raw, Some(_)) => return Err(ConfigError::UnexpectedPath { id }),
            (ModeTag::Structured, None) => return Err(ConfigError::MissingPath { id }),
            (ModeTag::Structured, Some(p)) => {
                let path = ExtractionPath::parse(&p)
                    .map_err(|source| ConfigError::Path { id: id.clone(), source })?;
                ResponseMode::Structured { path, envelope: r.envelope.unwrap_or_default() }
            }
        };
        let name = if r.name.trim().is_empty() { id.clone() } else { r.name };
        Ok(Self { id, name, endpoint: r.endpoint, kind: r.kind, mode })
    }
}

impl From<SourceDescriptor> for SourceRecord {
    fn from(d: SourceDescriptor) -> Self {
        let (mode, path, envelope) = match d.mode {
            ResponseMode::Raw => (ModeTag::Raw, None, None),
            ResponseMode::Structured { path, envelope } => {
                let envelope = (envelope != Envelope::default()).then_some(envelope);
                (ModeTag::Structured, Some(path.to_string()), envelope)
            }
        };
        Self { id: d.id, name: d.name, endpoint: d.endpoint, kind: d.kind, mode, path, envelope }
    }
}

fn validate_id(id: &str) -> Result<(), ConfigError> {
    if id.is_empty() || id.trim() != id {
        return Err(ConfigError::EmptyId);
    }
    Ok(())
}

fn validate_endpoint(id: &str, endpoint: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidEndpoint {
        id: id.to_string(),
        endpoint: endpoint.to_string(),
        reason,
    };
    let parsed = url::Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme `{other}`"))),
    }
}
