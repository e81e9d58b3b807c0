//! Translation service: the contract controllers call into.
//!
//! Writes always go to the durable store first. A single-key write then
//! patches the cache with `put`; a batch import rebuilds the tenant's segment
//! once after every entry has been attempted. A failed store write never
//! reaches the cache.

use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{CacheReport, Segment, TranslationCache};
use crate::error::{Result, TranslationError};
use crate::models::{
    Category, ImportReport, NewTranslation, Provenance, TranslationFilter, TranslationRecord,
    TranslationStats, UpsertFields,
};
use crate::store::TranslationStore;

/// Owns the cache and a handle to the durable store. Built once at startup
/// and shared with every request handler.
pub struct TranslationService {
    store: Arc<dyn TranslationStore>,
    cache: TranslationCache,
}

impl TranslationService {
    pub fn new(store: Arc<dyn TranslationStore>) -> Self {
        Self {
            store,
            cache: TranslationCache::new(),
        }
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    /// Cached translation for `key`. A miss is `None`, never an error.
    pub fn get_translation(&self, tenant_id: &str, key: &str) -> Option<String> {
        self.cache.lookup(tenant_id, key)
    }

    /// Rewrite string leaves of `payload` by field name using the tenant's cache.
    pub fn translate_structure(&self, payload: &Value, tenant_id: &str) -> Value {
        self.cache.translate(tenant_id, payload)
    }

    /// Create or replace one translation, then patch the cache.
    pub async fn add_translation(
        &self,
        tenant_id: &str,
        entry: &NewTranslation,
        editor_id: Option<&str>,
    ) -> Result<TranslationRecord> {
        validate_tenant(tenant_id)?;
        let category = entry.validate()?;

        let fields = UpsertFields {
            source_text: entry.source_text.clone(),
            target_text: entry.target_text.clone(),
            category,
            provenance: None,
            approved: None,
            last_editor: editor_id.map(str::to_string),
        };

        let record = self.store.upsert(tenant_id, &entry.key, &fields).await?;
        self.cache.put(tenant_id, &record.key, &record.target_text);

        Ok(record)
    }

    /// Best-effort sequential import followed by one cache rebuild.
    ///
    /// Entries are written in input order as approved system translations.
    /// A failing entry is logged and counted; earlier writes are not rolled
    /// back and later entries are still attempted.
    pub async fn import_translations(
        &self,
        tenant_id: &str,
        entries: &[NewTranslation],
    ) -> Result<ImportReport> {
        validate_tenant(tenant_id)?;
        if entries.is_empty() {
            return Err(TranslationError::validation("Translations array is required"));
        }

        let mut report = ImportReport::default();
        for entry in entries {
            match self.import_one(tenant_id, entry).await {
                Ok(record) => report.imported.push(record),
                Err(e) => {
                    warn!(
                        "Import of key '{}' for tenant {} failed: {}",
                        entry.key, tenant_id, e
                    );
                    report.failed += 1;
                }
            }
        }

        self.cache.rebuild(self.store.as_ref(), tenant_id).await?;

        info!(
            "Imported {} translations for tenant {} ({} failed)",
            report.count(),
            tenant_id,
            report.failed
        );
        Ok(report)
    }

    async fn import_one(
        &self,
        tenant_id: &str,
        entry: &NewTranslation,
    ) -> Result<TranslationRecord> {
        let category = entry.validate()?;
        let fields = UpsertFields {
            source_text: entry.source_text.clone(),
            target_text: entry.target_text.clone(),
            category,
            provenance: Some(Provenance::System),
            approved: Some(true),
            last_editor: None,
        };
        self.store.upsert(tenant_id, &entry.key, &fields).await
    }

    /// Store query, optionally narrowed to one category. Bypasses the cache.
    pub async fn get_translations(
        &self,
        tenant_id: &str,
        category: Option<Category>,
    ) -> Result<Vec<TranslationRecord>> {
        let filter = TranslationFilter::tenant(tenant_id).with_category(category);
        self.store.find(&filter).await
    }

    /// Single stored record, or `NotFound`.
    pub async fn get_translation_record(
        &self,
        tenant_id: &str,
        key: &str,
    ) -> Result<TranslationRecord> {
        let filter = TranslationFilter::tenant(tenant_id).with_key(key);
        self.store
            .find(&filter)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| TranslationError::NotFound(format!("translation '{}'", key)))
    }

    pub async fn stats(&self, tenant_id: &str) -> Result<TranslationStats> {
        let records = self.get_translations(tenant_id, None).await?;
        Ok(TranslationStats::from_records(&records))
    }

    /// Full rebuild of the tenant's segment; run when an account is created.
    pub async fn warm_cache(&self, tenant_id: &str) -> Result<Segment> {
        validate_tenant(tenant_id)?;
        self.cache.rebuild(self.store.as_ref(), tenant_id).await
    }

    pub fn cache_report(&self) -> CacheReport {
        self.cache.report()
    }
}

fn validate_tenant(tenant_id: &str) -> Result<()> {
    if tenant_id.trim().is_empty() {
        return Err(TranslationError::validation("Tenant id is required"));
    }
    Ok(())
}
