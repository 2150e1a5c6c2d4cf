use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::AnyPool;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedSourceInsert {
    pub id: String,
    pub kind: String, // "image" | "video"
    pub name: String,
    pub payload: String, // JSON of the source record
}

pub async fn upsert_saved_source(pool: &AnyPool, s: &SavedSourceInsert) -> Result<()> {
    sqlx::query(
        "INSERT INTO saved_sources(id, kind, name, payload) VALUES(?, ?, ?, ?)\n         ON CONFLICT(id) DO UPDATE SET\n           kind=excluded.kind, name=excluded.name, payload=excluded.payload,\n           updated_at=CURRENT_TIMESTAMP",
    )
    .bind(&s.id)
    .bind(&s.kind)
    .bind(&s.name)
    .bind(&s.payload)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_saved_source_payload(pool: &AnyPool, id: &str) -> Result<Option<String>> {
    let row = sqlx::query_scalar::<_, String>("SELECT payload FROM saved_sources WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Payloads in first-save order; an upsert keeps the row's rowid.
pub async fn list_saved_source_payloads(pool: &AnyPool, kind: Option<&str>) -> Result<Vec<String>> {
    let rows = if let Some(k) = kind {
        sqlx::query_scalar::<_, String>(
            "SELECT payload FROM saved_sources WHERE kind = ? ORDER BY rowid",
        )
        .bind(k)
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query_scalar::<_, String>("SELECT payload FROM saved_sources ORDER BY rowid")
            .fetch_all(pool)
            .await?
    };
    Ok(rows)
}

pub async fn delete_saved_source(pool: &AnyPool, id: &str) -> Result<u64> {
    let res = sqlx::query("DELETE FROM saved_sources WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}
