//! Per-tenant in-memory translation cache.
//!
//! Each tenant owns a segment mapping translation key to target text. The
//! segment is a projection of the durable store and may lag behind it until
//! the next `put` or `rebuild` touching the key.
//!
//! Segments are looked up through a sharded map and guarded by their own
//! `RwLock`, so operations on different tenants never contend on a common
//! lock. Nothing in here performs I/O except `rebuild`, which reads the store
//! before taking any lock.

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

use crate::error::Result;
use crate::models::TranslationFilter;
use crate::store::TranslationStore;
use crate::translate;

/// One tenant's `key -> target_text` mapping.
pub type Segment = HashMap<String, String>;

type SharedSegment = Arc<RwLock<Segment>>;

/// Translation cache shared by all request handlers.
#[derive(Debug, Default)]
pub struct TranslationCache {
    segments: DashMap<String, SharedSegment>,
    metrics: CacheMetrics,
}

impl TranslationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reload every record of `tenant_id` from the store and swap the segment.
    ///
    /// The store read happens first; on failure the previous segment, if any,
    /// stays in place untouched.
    pub async fn rebuild(&self, store: &dyn TranslationStore, tenant_id: &str) -> Result<Segment> {
        let records = store.find(&TranslationFilter::tenant(tenant_id)).await?;

        let mut fresh = Segment::with_capacity(records.len());
        for record in records {
            fresh.insert(record.key, record.target_text);
        }

        self.replace(tenant_id, fresh.clone());
        self.metrics.record_rebuild();
        info!("Cached {} translations for tenant {}", fresh.len(), tenant_id);

        Ok(fresh)
    }

    /// Swap in a complete segment for `tenant_id`. Concurrent rebuilds: last writer wins.
    fn replace(&self, tenant_id: &str, fresh: Segment) {
        let segment = self.segment_or_create(tenant_id);
        *segment.write().unwrap_or_else(PoisonError::into_inner) = fresh;
    }

    /// Cached target text for `key`, or `None` when the tenant has no segment
    /// or the key is absent. Never touches the store.
    pub fn lookup(&self, tenant_id: &str, key: &str) -> Option<String> {
        let value = self.segment(tenant_id).and_then(|segment| {
            let entries = segment.read().unwrap_or_else(PoisonError::into_inner);
            entries.get(key).cloned()
        });

        self.metrics.record_lookup(value.is_some());
        value
    }

    /// Insert or overwrite a single entry, creating the segment if needed.
    pub fn put(&self, tenant_id: &str, key: &str, target_text: &str) {
        let segment = self.segment_or_create(tenant_id);
        segment
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), target_text.to_string());

        self.metrics.record_put();
        debug!("Cache put {}/{}", tenant_id, key);
    }

    /// Copy of the tenant's current segment.
    pub fn snapshot(&self, tenant_id: &str) -> Option<Segment> {
        self.segment(tenant_id).map(|segment| {
            let entries = segment.read().unwrap_or_else(PoisonError::into_inner);
            entries.clone()
        })
    }

    pub fn contains_tenant(&self, tenant_id: &str) -> bool {
        self.segments.contains_key(tenant_id)
    }

    /// Hold a read guard on one segment for a batch of lookups.
    ///
    /// The closure receives `None` when the tenant was never cached.
    pub fn with_segment<T>(&self, tenant_id: &str, f: impl FnOnce(Option<&Segment>) -> T) -> T {
        match self.segment(tenant_id) {
            Some(segment) => {
                let guard = segment.read().unwrap_or_else(PoisonError::into_inner);
                f(Some(&*guard))
            }
            None => f(None),
        }
    }

    /// Translate `payload` against one consistent view of the tenant segment.
    ///
    /// Every string field looked up counts as a hit or a miss. A tenant that
    /// was never cached gets its payload back unchanged and counts nothing.
    pub fn translate(&self, tenant_id: &str, payload: &Value) -> Value {
        self.with_segment(tenant_id, |segment| match segment {
            Some(entries) => translate::translate_value(payload, &|field: &str| {
                let value = entries.get(field).cloned();
                self.metrics.record_lookup(value.is_some());
                value
            }),
            None => payload.clone(),
        })
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    /// Counters plus current segment sizes.
    pub fn report(&self) -> CacheReport {
        let segments: Vec<SharedSegment> = self
            .segments
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        let entries = segments
            .iter()
            .map(|s| s.read().unwrap_or_else(PoisonError::into_inner).len())
            .sum();

        self.metrics.report(segments.len(), entries)
    }

    fn segment(&self, tenant_id: &str) -> Option<SharedSegment> {
        // Clone the Arc so the shard lock is released before the segment lock is taken.
        self.segments.get(tenant_id).map(|s| Arc::clone(s.value()))
    }

    fn segment_or_create(&self, tenant_id: &str) -> SharedSegment {
        if let Some(segment) = self.segment(tenant_id) {
            return segment;
        }
        Arc::clone(
            self.segments
                .entry(tenant_id.to_string())
                .or_default()
                .value(),
        )
    }
}

/// Hit/miss and write counters for one cache instance.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicUsize,
    misses: AtomicUsize,
    rebuilds: AtomicUsize,
    puts: AtomicUsize,
}

impl CacheMetrics {
    fn record_lookup(&self, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_rebuild(&self) {
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
    }

    fn record_put(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }

    fn report(&self, segments: usize, entries: usize) -> CacheReport {
        let hits = self.hits();
        let misses = self.misses();
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        CacheReport {
            segments,
            entries,
            hits,
            misses,
            hit_rate,
            rebuilds: self.rebuilds.load(Ordering::Relaxed),
            puts: self.puts.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of cache counters, serialized by the stats endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheReport {
    pub segments: usize,
    pub entries: usize,
    pub hits: usize,
    pub misses: usize,
    /// Percentage of lookups answered from the cache, counting point
    /// lookups and every string field of translated payloads.
    pub hit_rate: f64,
    pub rebuilds: usize,
    pub puts: usize,
}
