use anyhow::{Context, Result};
use directories::ProjectDirs;
use sqlx::{any::AnyConnectOptions, AnyPool, ConnectOptions, migrate::Migrator};
use sqlx::any::AnyPoolOptions;
use std::{path::PathBuf, str::FromStr};
use std::sync::Once;

use crate::dao;
use crate::mapping::{saved_insert_from_source, source_from_payload};
use crate::storage::SourceStore;
use crate::types::{MediaKind, SourceDescriptor};

// Ensure drivers are installed exactly once for sqlx::any
static INSTALL_DRIVERS: Once = Once::new();

// Embed SQL migrations from the migrations/ directory
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed [`SourceStore`].
#[derive(Clone)]
pub struct Database {
    pool: AnyPool,
}

impl Database {
    // Create a connection pool. If database_url is None, use a SQLite file in
    // the user's data directory.
    pub async fn connect(database_url: Option<&str>) -> Result<Self> {
        INSTALL_DRIVERS.call_once(sqlx::any::install_default_drivers);

        let url = match database_url {
            Some(u) if !u.trim().is_empty() => u.to_string(),
            _ => default_sqlite_url()?,
        };

        let opts = AnyConnectOptions::from_str(&url)
            .with_context(|| format!("invalid database URL: {url}"))?;
        // Quiet by default; callers can enable SQLX_LOG if they want
        let opts = opts.disable_statement_logging();

        // Every connection to an in-memory SQLite URL is a separate database.
        let max_connections = if url.contains(":memory:") { 1 } else { 4 };
        let pool = AnyPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await
            .with_context(|| format!("failed to connect to database: {url}"))?;

        Ok(Self { pool })
    }

    /// Connect and bring the schema up to date.
    pub async fn open(database_url: Option<&str>) -> Result<Self> {
        let db = Self::connect(database_url).await?;
        db.run_migrations().await?;
        Ok(db)
    }

    pub async fn run_migrations(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.context("running migrations")
    }
}

#[async_trait::async_trait]
impl SourceStore for Database {
    async fn load(&self, id: &str) -> Result<Option<SourceDescriptor>> {
        dao::find_saved_source_payload(&self.pool, id)
            .await?
            .map(|p| source_from_payload(&p))
            .transpose()
    }

    async fn list(&self) -> Result<Vec<SourceDescriptor>> {
        dao::list_saved_source_payloads(&self.pool, None)
            .await?
            .iter()
            .map(|p| source_from_payload(p))
            .collect()
    }

    async fn list_of_kind(&self, kind: MediaKind) -> Result<Vec<SourceDescriptor>> {
        dao::list_saved_source_payloads(&self.pool, Some(kind.as_str()))
            .await?
            .iter()
            .map(|p| source_from_payload(p))
            .collect()
    }

    async fn save(&self, source: &SourceDescriptor) -> Result<()> {
        let row = saved_insert_from_source(source)?;
        dao::upsert_saved_source(&self.pool, &row).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(dao::delete_saved_source(&self.pool, id).await? > 0)
    }
}

fn default_sqlite_url() -> Result<String> {
    let proj = ProjectDirs::from("dev", "gallery", "gallery")
        .context("unable to determine data directory for default sqlite path")?;
    let mut path: PathBuf = proj.data_dir().to_path_buf();
    std::fs::create_dir_all(&path).with_context(|| format!("creating data dir: {}", path.display()))?;
    path.push("gallery.db");
    Ok(sqlite_url_for(&path))
}

pub fn sqlite_url_for(path: &std::path::Path) -> String {
    // Encode spaces in the path for a valid sqlite URL
    let path_str = path.to_string_lossy().replace(' ', "%20");
    let path_str = path_str.trim_start_matches('/');
    format!("sqlite:///{path_str}?mode=rwc")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::ExtractionPath;

    async fn temp_db() -> (tempfile::TempDir, Database) {
        let tmp = tempfile::tempdir().unwrap();
        let url = sqlite_url_for(&tmp.path().join("gallery.db"));
        let db = Database::open(Some(&url)).await.unwrap();
        (tmp, db)
    }

    #[test]
    fn sqlite_url_encodes_spaces() {
        let url = sqlite_url_for(std::path::Path::new("/tmp/my dir/g.db"));
        assert_eq!(url, "sqlite:///tmp/my%20dir/g.db?mode=rwc");
    }

    #[tokio::test]
    async fn saves_loads_and_deletes() {
        let (_tmp, db) = temp_db().await;
        let src = SourceDescriptor::structured(
            "wm_bing",
            "维梦_bing",
            "https://api.example.com/bing",
            ExtractionPath::parse("data.pc_url").unwrap(),
        );
        db.save(&src).await.unwrap();
        assert_eq!(db.load("wm_bing").await.unwrap(), Some(src.clone()));
        assert_eq!(db.list().await.unwrap().len(), 1);

        assert!(db.delete("wm_bing").await.unwrap());
        assert!(!db.delete("wm_bing").await.unwrap());
        assert_eq!(db.load("wm_bing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_replaces_by_id_and_filters_by_kind() {
        let (_tmp, db) = temp_db().await;
        db.save(&SourceDescriptor::raw("a", "A", "https://a.example.com")).await.unwrap();
        db.save(&SourceDescriptor::raw("v", "V", "https://v.example.com").with_kind(MediaKind::Video))
            .await
            .unwrap();
        db.save(&SourceDescriptor::raw("a", "A2", "https://a.example.com/2")).await.unwrap();

        let all = db.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(db.load("a").await.unwrap().unwrap().name, "A2");

        let videos = db.list_of_kind(MediaKind::Video).await.unwrap();
        assert_eq!(videos.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(), ["v"]);
    }

    #[tokio::test]
    async fn lists_in_save_order() {
        let (_tmp, db) = temp_db().await;
        for id in ["zebra", "apple", "mango"] {
            db.save(&SourceDescriptor::raw(id, id, "https://a.example.com")).await.unwrap();
        }
        db.save(&SourceDescriptor::raw("zebra", "Zebra", "https://z.example.com")).await.unwrap();
        let ids: Vec<_> = db.list().await.unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, ["zebra", "apple", "mango"]);
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let (_tmp, db) = temp_db().await;
        db.save(&SourceDescriptor::raw("a", "A", "https://a.example.com")).await.unwrap();
        db.run_migrations().await.unwrap();
        assert_eq!(db.list().await.unwrap().len(), 1);
    }
}
