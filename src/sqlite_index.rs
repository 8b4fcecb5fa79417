//! SQLite-backed [`VectorIndex`] implementation.
//!
//! Each project is a row in `collections` plus its rows in `entries`.
//! Vectors are stored as little-endian f32 BLOBs and ranked by an exact
//! brute-force scan, which suits the small per-project corpora this tool is
//! built for.
//!
//! `reset_collection` runs in one transaction. Entries are then added one
//! statement at a time, so a reader running alongside an ingest sees
//! whatever has been committed so far: the empty collection, then a growing
//! prefix of it. Access to a project is not serialized; the CLI runs ingest
//! and query as separate commands. A run that fails partway leaves the
//! collection partially populated until the next full reset.

use std::path::Path;

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use projrag_core::embedding::{blob_to_vec, check_dims, vec_to_blob, DistanceMetric};
use projrag_core::index::{rank_neighbors, CollectionInfo, CollectionSpec, VectorIndex};
use projrag_core::models::{EntryMetadata, IndexEntry, Neighbor};
use projrag_core::RagError;

use crate::db;
use crate::migrate;

/// SQLite implementation of the [`VectorIndex`] trait.
pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the database at `path`, creating the schema if needed.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

const COLLECTION_SELECT: &str = r#"
    SELECT c.name, c.model, c.dims, c.metric, c.created_at, COUNT(e.id) AS entry_count
    FROM collections c
    LEFT JOIN entries e ON e.collection = c.name
"#;

fn row_to_info(row: &SqliteRow) -> Result<CollectionInfo> {
    let metric: String = row.try_get("metric")?;
    Ok(CollectionInfo {
        name: row.try_get("name")?,
        model: row.try_get("model")?,
        dims: row.try_get::<i64, _>("dims")? as usize,
        metric: DistanceMetric::parse(&metric)?,
        created_at: row.try_get("created_at")?,
        count: row.try_get::<i64, _>("entry_count")? as usize,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|e| e.is_unique_violation())
        .unwrap_or(false)
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn reset_collection(&self, name: &str, spec: &CollectionSpec) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM entries WHERE collection = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO collections (name, model, dims, metric, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(&spec.model)
        .bind(spec.dims as i64)
        .bind(spec.metric.as_str())
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn add(&self, name: &str, entry: &IndexEntry) -> Result<()> {
        let dims: Option<i64> = sqlx::query_scalar("SELECT dims FROM collections WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        let Some(dims) = dims else {
            bail!(RagError::CollectionNotFound(name.to_string()));
        };
        check_dims(&entry.embedding, dims as usize)?;

        let result = sqlx::query(
            r#"
            INSERT INTO entries (collection, id, embedding, text, source, chunk_index, hash)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(&entry.id)
        .bind(vec_to_blob(&entry.embedding))
        .bind(&entry.metadata.text)
        .bind(&entry.metadata.source)
        .bind(entry.metadata.chunk_index.map(|i| i as i64))
        .bind(&entry.metadata.hash)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => bail!(RagError::DuplicateId(entry.id.clone())),
            Err(e) => Err(e.into()),
        }
    }

    async fn count(&self, name: &str) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries WHERE collection = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn query(&self, name: &str, embedding: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let metric: Option<String> =
            sqlx::query_scalar("SELECT metric FROM collections WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        let Some(metric) = metric else {
            return Ok(Vec::new());
        };
        let metric = DistanceMetric::parse(&metric)?;

        let rows = sqlx::query(
            r#"
            SELECT id, embedding, text, source, chunk_index, hash
            FROM entries
            WHERE collection = ?
            "#,
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        let mut neighbors = Vec::with_capacity(rows.len());
        for row in rows {
            let blob: Vec<u8> = row.try_get("embedding")?;
            let vector = blob_to_vec(&blob);
            neighbors.push(Neighbor {
                id: row.try_get("id")?,
                metadata: EntryMetadata {
                    text: row.try_get("text")?,
                    source: row.try_get("source")?,
                    chunk_index: row
                        .try_get::<Option<i64>, _>("chunk_index")?
                        .map(|i| i as usize),
                    hash: row.try_get("hash")?,
                },
                distance: metric.distance(embedding, &vector),
            });
        }

        Ok(rank_neighbors(neighbors, k))
    }

    async fn collection(&self, name: &str) -> Result<Option<CollectionInfo>> {
        let sql = format!("{} WHERE c.name = ? GROUP BY c.name", COLLECTION_SELECT);
        let row = sqlx::query(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_info).transpose()
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let sql = format!("{} GROUP BY c.name ORDER BY c.name", COLLECTION_SELECT);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_info).collect()
    }
}
