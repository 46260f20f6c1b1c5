// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Postgres catalog backed by sqlx.

use super::{Catalog, ACTIVITIES_TABLE};
use crate::error::{AppError, Result};
use crate::models::{
    ActivityId, ActivityMetadata, ActivityRecord, Candidate, DigestRow, OriginalFormat,
    RecordSource,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};

/// Keep one connection free for manual access to the database.
const MAX_CONNECTIONS: u32 = 4;

#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

#[derive(FromRow)]
struct ActivityRow {
    id: i64,
    source: String,
    data_digest: String,
    original_digest: String,
    original_format: String,
    #[sqlx(rename = "type")]
    activity_type: Option<String>,
    gear_id: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ActivityRow> for ActivityRecord {
    type Error = AppError;

    fn try_from(row: ActivityRow) -> Result<Self> {
        let source = RecordSource::parse(&row.source).ok_or_else(|| {
            AppError::Database(format!("Unknown source {:?} for {}", row.source, row.id))
        })?;
        let original_format = match row.original_format.as_str() {
            "" => None,
            other => Some(OriginalFormat::parse(other).ok_or_else(|| {
                AppError::Database(format!("Unknown original_format {:?} for {}", other, row.id))
            })?),
        };
        Ok(ActivityRecord {
            id: ActivityId(to_id(row.id)?),
            source,
            data_digest: row.data_digest,
            original_digest: row.original_digest,
            original_format,
            activity_type: row.activity_type,
            gear_id: row.gear_id,
            timestamp: row.timestamp,
            created_at: row.created_at,
        })
    }
}

fn to_id(raw: i64) -> Result<u64> {
    u64::try_from(raw).map_err(|_| AppError::Database(format!("Negative activity id {}", raw)))
}

fn to_db_id(id: ActivityId) -> Result<i64> {
    i64::try_from(id.0).map_err(|_| AppError::Database(format!("Activity id {} out of range", id)))
}

fn digest_rows(rows: Vec<(i64, String)>) -> Result<Vec<DigestRow>> {
    rows.into_iter()
        .map(|(id, digest)| {
            Ok(DigestRow {
                id: ActivityId(to_id(id)?),
                digest,
            })
        })
        .collect()
}

impl PgCatalog {
    /// Connect to Postgres.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Postgres: {}", e)))?;

        tracing::info!("Connected to Postgres");
        Ok(Self { pool })
    }

    /// Apply embedded schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Migration failed: {}", e)))?;
        tracing::info!("Catalog migrations applied");
        Ok(())
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn insert_candidates(&self, candidates: &[Candidate]) -> Result<u64> {
        if candidates.is_empty() {
            return Ok(0);
        }

        let ids = candidates
            .iter()
            .map(|c| to_db_id(c.id))
            .collect::<Result<Vec<_>>>()?;
        let sources: Vec<&str> = candidates.iter().map(|c| c.source.as_str()).collect();

        let sql = format!(
            "INSERT INTO {ACTIVITIES_TABLE} (id, source) \
             SELECT * FROM UNNEST($1::bigint[], $2::text[]) \
             ON CONFLICT (id) DO NOTHING"
        );
        let result = sqlx::query(&sql)
            .bind(&ids)
            .bind(&sources)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn get(&self, id: ActivityId) -> Result<Option<ActivityRecord>> {
        let sql = format!(
            "SELECT id, source, data_digest, original_digest, original_format, \
             type, gear_id, timestamp, created_at \
             FROM {ACTIVITIES_TABLE} WHERE id = $1"
        );
        let row = sqlx::query_as::<_, ActivityRow>(&sql)
            .bind(to_db_id(id)?)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ActivityRecord::try_from).transpose()
    }

    async fn data_sync_candidates(&self, cutoff: DateTime<Utc>) -> Result<Vec<DigestRow>> {
        let sql = format!(
            "SELECT id, data_digest FROM {ACTIVITIES_TABLE} \
             WHERE data_digest = '' OR created_at > $1 \
             ORDER BY id ASC"
        );
        let rows = sqlx::query_as::<_, (i64, String)>(&sql)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;

        digest_rows(rows)
    }

    async fn original_sync_candidates(&self, cutoff: DateTime<Utc>) -> Result<Vec<DigestRow>> {
        let sql = format!(
            "SELECT id, original_digest FROM {ACTIVITIES_TABLE} \
             WHERE (original_digest = '' OR created_at > $1) \
             AND original_format <> 'missing' \
             ORDER BY id ASC"
        );
        let rows = sqlx::query_as::<_, (i64, String)>(&sql)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;

        digest_rows(rows)
    }

    async fn update_data(
        &self,
        id: ActivityId,
        digest: &str,
        metadata: &ActivityMetadata,
    ) -> Result<()> {
        let sql = format!(
            "UPDATE {ACTIVITIES_TABLE} \
             SET data_digest = $2, type = $3, gear_id = $4, timestamp = $5 \
             WHERE id = $1"
        );
        sqlx::query(&sql)
            .bind(to_db_id(id)?)
            .bind(digest)
            .bind(metadata.activity_type.as_deref())
            .bind(metadata.gear_id.as_deref())
            .bind(metadata.timestamp)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_original(
        &self,
        id: ActivityId,
        digest: &str,
        format: OriginalFormat,
    ) -> Result<()> {
        let sql = format!(
            "UPDATE {ACTIVITIES_TABLE} \
             SET original_digest = $2, original_format = $3 \
             WHERE id = $1"
        );
        sqlx::query(&sql)
            .bind(to_db_id(id)?)
            .bind(digest)
            .bind(format.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_original_missing(&self, id: ActivityId) -> Result<()> {
        let sql = format!("UPDATE {ACTIVITIES_TABLE} SET original_format = $2 WHERE id = $1");
        sqlx::query(&sql)
            .bind(to_db_id(id)?)
            .bind(OriginalFormat::Missing.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
