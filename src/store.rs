//! Durable translation store contract.
//!
//! The cache and mutation pipeline only ever talk to storage through
//! [`TranslationStore`]. [`crate::db::Database`] backs it with PostgreSQL;
//! [`MemoryStore`] keeps everything in-process with the same semantics.

use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use crate::error::Result;
use crate::models::{Provenance, TranslationFilter, TranslationRecord, UpsertFields};

/// Keyed record storage with a `(tenant_id, key)` uniqueness constraint.
pub trait TranslationStore: Send + Sync {
    /// All records matching `filter`, ordered by key.
    fn find<'a>(
        &'a self,
        filter: &'a TranslationFilter,
    ) -> BoxFuture<'a, Result<Vec<TranslationRecord>>>;

    /// Insert or replace the record keyed by `(tenant_id, key)` in one step.
    fn upsert<'a>(
        &'a self,
        tenant_id: &'a str,
        key: &'a str,
        fields: &'a UpsertFields,
    ) -> BoxFuture<'a, Result<TranslationRecord>>;
}

/// In-process store. Used when no database is configured, and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<(String, String), TranslationRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records across all tenants.
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TranslationStore for MemoryStore {
    fn find<'a>(
        &'a self,
        filter: &'a TranslationFilter,
    ) -> BoxFuture<'a, Result<Vec<TranslationRecord>>> {
        async move {
            let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
            // Keys are (tenant, key) so a tenant's records are contiguous and sorted.
            let found = records
                .range((filter.tenant_id.clone(), String::new())..)
                .take_while(|((tenant, _), _)| *tenant == filter.tenant_id)
                .map(|(_, record)| record)
                .filter(|record| filter.matches(record))
                .cloned()
                .collect();
            Ok(found)
        }
        .boxed()
    }

    fn upsert<'a>(
        &'a self,
        tenant_id: &'a str,
        key: &'a str,
        fields: &'a UpsertFields,
    ) -> BoxFuture<'a, Result<TranslationRecord>> {
        async move {
            let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
            let now = Utc::now();
            let record = records
                .entry((tenant_id.to_string(), key.to_string()))
                .and_modify(|existing| {
                    existing.source_text = fields.source_text.clone();
                    existing.target_text = fields.target_text.clone();
                    existing.category = fields.category;
                    if let Some(provenance) = fields.provenance {
                        existing.provenance = provenance;
                    }
                    if let Some(approved) = fields.approved {
                        existing.approved = approved;
                    }
                    if fields.last_editor.is_some() {
                        existing.last_editor = fields.last_editor.clone();
                    }
                    existing.updated_at = now;
                })
                .or_insert_with(|| TranslationRecord {
                    tenant_id: tenant_id.to_string(),
                    key: key.to_string(),
                    source_text: fields.source_text.clone(),
                    target_text: fields.target_text.clone(),
                    category: fields.category,
                    approved: fields.approved.unwrap_or(false),
                    provenance: fields.provenance.unwrap_or(Provenance::System),
                    votes: 0,
                    last_editor: fields.last_editor.clone(),
                    created_at: now,
                    updated_at: now,
                });
            Ok(record.clone())
        }
        .boxed()
    }
}
