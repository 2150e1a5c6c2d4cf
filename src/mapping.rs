use anyhow::{Context, Result};

use crate::dao::SavedSourceInsert;
use crate::types::SourceDescriptor;

pub fn saved_insert_from_source(source: &SourceDescriptor) -> Result<SavedSourceInsert> {
    let payload = serde_json::to_string(source)
        .with_context(|| format!("serializing source '{}'", source.id))?;
    Ok(SavedSourceInsert {
        id: source.id.clone(),
        kind: source.kind.as_str().to_string(),
        name: source.name.clone(),
        payload,
    })
}

pub fn source_from_payload(payload: &str) -> Result<SourceDescriptor> {
    serde_json::from_str(payload).context("decoding saved source payload")
}
