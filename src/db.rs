use anyhow::{Context, Result as AnyResult};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::error::{Result, TranslationError};
use crate::models::{TranslationFilter, TranslationRecord, UpsertFields};
use crate::store::TranslationStore;

const RECORD_COLUMNS: &str = "tenant_id, key, source_text, target_text, category, approved, \
     provenance, votes, last_editor, created_at, updated_at";

/// Raw `translations` row; enum columns are stored as text.
#[derive(Debug, Clone, sqlx::FromRow)]
struct TranslationRow {
    tenant_id: String,
    key: String,
    source_text: String,
    target_text: String,
    category: String,
    approved: bool,
    provenance: String,
    votes: i32,
    last_editor: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TranslationRow> for TranslationRecord {
    type Error = TranslationError;

    fn try_from(row: TranslationRow) -> Result<Self> {
        // A bad enum value in storage is a store fault, not caller input.
        let category = row.category.parse().map_err(|_| {
            TranslationError::store(format!(
                "corrupt category '{}' for key '{}'",
                row.category, row.key
            ))
        })?;
        let provenance = row.provenance.parse().map_err(|_| {
            TranslationError::store(format!(
                "corrupt provenance '{}' for key '{}'",
                row.provenance, row.key
            ))
        })?;

        Ok(TranslationRecord {
            tenant_id: row.tenant_id,
            key: row.key,
            source_text: row.source_text,
            target_text: row.target_text,
            category,
            approved: row.approved,
            provenance,
            votes: row.votes,
            last_editor: row.last_editor,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// PostgreSQL-backed translation store.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL and make sure the schema exists
    pub async fn new(database_url: &str, max_connections: u32) -> AnyResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;

        let db = Self { pool };
        db.init_schema().await?;

        info!("Database ready ({} max connections)", max_connections);
        Ok(db)
    }

    /// Create the translations table (safe to run always)
    pub async fn init_schema(&self) -> AnyResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS translations (
                id BIGSERIAL PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                key TEXT NOT NULL,
                source_text TEXT NOT NULL,
                target_text TEXT NOT NULL,
                category TEXT NOT NULL,
                approved BOOLEAN NOT NULL DEFAULT FALSE,
                provenance TEXT NOT NULL DEFAULT 'system',
                votes INTEGER NOT NULL DEFAULT 0,
                last_editor TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (tenant_id, key)
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create translations table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS translations_tenant_category_idx
             ON translations (tenant_id, category)",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create category index")?;

        Ok(())
    }

    async fn find_rows(&self, filter: &TranslationFilter) -> Result<Vec<TranslationRecord>> {
        let sql = format!(
            "SELECT {} FROM translations
             WHERE tenant_id = $1
               AND ($2::TEXT IS NULL OR key = $2)
               AND ($3::TEXT IS NULL OR category = $3)
             ORDER BY key ASC",
            RECORD_COLUMNS
        );

        let rows: Vec<TranslationRow> = sqlx::query_as(&sql)
            .bind(&filter.tenant_id)
            .bind(filter.key.as_deref())
            .bind(filter.category.map(|c| c.as_str()))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TranslationRecord::try_from).collect()
    }

    async fn upsert_row(
        &self,
        tenant_id: &str,
        key: &str,
        fields: &UpsertFields,
    ) -> Result<TranslationRecord> {
        // Optional fields are NULL when unspecified: keep the stored value on
        // conflict, fall back to the column default on insert.
        let sql = format!(
            "INSERT INTO translations
                (tenant_id, key, source_text, target_text, category, provenance, approved, last_editor)
             VALUES ($1, $2, $3, $4, $5, COALESCE($6, 'system'), COALESCE($7, FALSE), $8)
             ON CONFLICT (tenant_id, key) DO UPDATE SET
                source_text = EXCLUDED.source_text,
                target_text = EXCLUDED.target_text,
                category = EXCLUDED.category,
                provenance = COALESCE($6, translations.provenance),
                approved = COALESCE($7, translations.approved),
                last_editor = COALESCE($8, translations.last_editor),
                updated_at = NOW()
             RETURNING {}",
            RECORD_COLUMNS
        );

        let row: TranslationRow = sqlx::query_as(&sql)
            .bind(tenant_id)
            .bind(key)
            .bind(&fields.source_text)
            .bind(&fields.target_text)
            .bind(fields.category.as_str())
            .bind(fields.provenance.map(|p| p.as_str()))
            .bind(fields.approved)
            .bind(fields.last_editor.as_deref())
            .fetch_one(&self.pool)
            .await?;

        row.try_into()
    }
}

impl TranslationStore for Database {
    fn find<'a>(
        &'a self,
        filter: &'a TranslationFilter,
    ) -> BoxFuture<'a, Result<Vec<TranslationRecord>>> {
        self.find_rows(filter).boxed()
    }

    fn upsert<'a>(
        &'a self,
        tenant_id: &'a str,
        key: &'a str,
        fields: &'a UpsertFields,
    ) -> BoxFuture<'a, Result<TranslationRecord>> {
        self.upsert_row(tenant_id, key, fields).boxed()
    }
}
