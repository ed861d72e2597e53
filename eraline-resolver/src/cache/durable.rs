//! Durable attribution store
//!
//! One row per subject, upserted on `subject_id`. Every failure surfaces as
//! `ResolverError::StoreUnavailable`; callers decide whether to swallow it.

use crate::error::{ResolverError, Result};
use crate::models::{AttributionEntry, AttributionSource, PeriodLabel, Reliability};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::debug;

/// SQLite bind-parameter headroom per batch query
const BATCH_CHUNK: usize = 500;

const SELECT_COLUMNS: &str = "SELECT subject_id, canonical_title, original_title, start_year, end_year, \
     additional_years, period_label, reliability, source, notes, created_at, updated_at \
     FROM attribution_entries";

/// Shared key-value store of attribution entries keyed by subject id
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn get(&self, subject_id: &str) -> Result<Option<AttributionEntry>>;

    /// Insert or replace; `created_at` of an existing row is kept
    async fn upsert(&self, entry: &AttributionEntry) -> Result<()>;

    /// Batch get; unknown ids are simply absent from the result
    async fn get_many(&self, subject_ids: &[String]) -> Result<Vec<AttributionEntry>>;

    async fn delete(&self, subject_id: &str) -> Result<bool>;

    async fn list_all(&self) -> Result<Vec<AttributionEntry>>;
}

fn store_err(e: impl std::fmt::Display) -> ResolverError {
    ResolverError::StoreUnavailable(e.to_string())
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| store_err(format!("bad timestamp {:?}: {}", value, e)))
}

fn row_to_entry(row: &SqliteRow) -> Result<AttributionEntry> {
    let additional_years: Option<String> = row.try_get("additional_years").map_err(store_err)?;
    let additional_years = match additional_years {
        Some(json) if !json.is_empty() => serde_json::from_str(&json).map_err(store_err)?,
        _ => Vec::new(),
    };

    let reliability: String = row.try_get("reliability").map_err(store_err)?;
    let reliability = Reliability::parse(&reliability)
        .ok_or_else(|| store_err(format!("bad reliability {:?}", reliability)))?;

    let period_label: String = row.try_get("period_label").map_err(store_err)?;
    let source: String = row.try_get("source").map_err(store_err)?;
    let created_at: String = row.try_get("created_at").map_err(store_err)?;
    let updated_at: String = row.try_get("updated_at").map_err(store_err)?;

    Ok(AttributionEntry {
        subject_id: row.try_get("subject_id").map_err(store_err)?,
        canonical_title: row.try_get("canonical_title").map_err(store_err)?,
        original_title: row.try_get("original_title").map_err(store_err)?,
        start_year: row.try_get("start_year").map_err(store_err)?,
        end_year: row.try_get("end_year").map_err(store_err)?,
        additional_years,
        period_label: PeriodLabel::parse(&period_label),
        reliability,
        source: AttributionSource::parse(&source),
        notes: row.try_get("notes").map_err(store_err)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

/// SQLite-backed durable store
#[derive(Debug, Clone)]
pub struct SqliteDurableStore {
    pool: SqlitePool,
}

impl SqliteDurableStore {
    /// Wrap a pool already initialized by `eraline_common::db`
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl DurableStore for SqliteDurableStore {
    async fn get(&self, subject_id: &str) -> Result<Option<AttributionEntry>> {
        let sql = format!("{} WHERE subject_id = ?", SELECT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(subject_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;

        row.as_ref().map(row_to_entry).transpose()
    }

    async fn upsert(&self, entry: &AttributionEntry) -> Result<()> {
        let additional_years = if entry.additional_years.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&entry.additional_years).map_err(store_err)?)
        };

        sqlx::query(
            r#"
            INSERT INTO attribution_entries (
                subject_id, canonical_title, original_title, start_year, end_year,
                additional_years, period_label, reliability, source, notes,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(subject_id) DO UPDATE SET
                canonical_title = excluded.canonical_title,
                original_title = excluded.original_title,
                start_year = excluded.start_year,
                end_year = excluded.end_year,
                additional_years = excluded.additional_years,
                period_label = excluded.period_label,
                reliability = excluded.reliability,
                source = excluded.source,
                notes = excluded.notes,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&entry.subject_id)
        .bind(&entry.canonical_title)
        .bind(&entry.original_title)
        .bind(entry.start_year)
        .bind(entry.end_year)
        .bind(additional_years)
        .bind(entry.period_label.as_str())
        .bind(entry.reliability.as_str())
        .bind(entry.source.tag())
        .bind(&entry.notes)
        .bind(format_timestamp(&entry.created_at))
        .bind(format_timestamp(&entry.updated_at))
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        debug!(subject_id = %entry.subject_id, reliability = %entry.reliability, "Upserted attribution entry");
        Ok(())
    }

    async fn get_many(&self, subject_ids: &[String]) -> Result<Vec<AttributionEntry>> {
        let mut entries = Vec::with_capacity(subject_ids.len());

        for chunk in subject_ids.chunks(BATCH_CHUNK) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_COLUMNS);
            builder.push(" WHERE subject_id IN (");
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(id.clone());
            }
            separated.push_unseparated(")");

            let rows = builder
                .build()
                .fetch_all(&self.pool)
                .await
                .map_err(store_err)?;
            for row in &rows {
                entries.push(row_to_entry(row)?);
            }
        }

        Ok(entries)
    }

    async fn delete(&self, subject_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM attribution_entries WHERE subject_id = ?")
            .bind(subject_id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_all(&self) -> Result<Vec<AttributionEntry>> {
        let sql = format!("{} ORDER BY subject_id", SELECT_COLUMNS);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        rows.iter().map(row_to_entry).collect()
    }
}
