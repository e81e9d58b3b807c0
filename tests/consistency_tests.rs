//! Store/cache consistency under failures and concurrent writers.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crm_translator::error::Result;
use crm_translator::models::{TranslationFilter, UpsertFields};
use crm_translator::{
    Category, MemoryStore, NewTranslation, TranslationError, TranslationRecord, TranslationService,
    TranslationStore,
};

// ==================== Test Helpers ====================

/// Wraps a `MemoryStore` and fails writes for chosen keys, or everything
/// once switched off.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    failing_keys: Mutex<HashSet<String>>,
    down: Mutex<bool>,
}

impl FlakyStore {
    fn fail_key(&self, key: &str) {
        self.failing_keys.lock().unwrap().insert(key.to_string());
    }

    fn set_down(&self, down: bool) {
        *self.down.lock().unwrap() = down;
    }

    fn is_down(&self) -> bool {
        *self.down.lock().unwrap()
    }
}

impl TranslationStore for FlakyStore {
    fn find<'a>(
        &'a self,
        filter: &'a TranslationFilter,
    ) -> BoxFuture<'a, Result<Vec<TranslationRecord>>> {
        if self.is_down() {
            return async { Err(TranslationError::store("store offline")) }.boxed();
        }
        self.inner.find(filter)
    }

    fn upsert<'a>(
        &'a self,
        tenant_id: &'a str,
        key: &'a str,
        fields: &'a UpsertFields,
    ) -> BoxFuture<'a, Result<TranslationRecord>> {
        let rejected = self.is_down() || self.failing_keys.lock().unwrap().contains(key);
        if rejected {
            return async { Err(TranslationError::store("write rejected")) }.boxed();
        }
        self.inner.upsert(tenant_id, key, fields)
    }
}

/// Wraps a `MemoryStore` and, once armed, parks the next successful upsert
/// until released.
#[derive(Default)]
struct GatedStore {
    inner: MemoryStore,
    armed: AtomicBool,
    paused: Notify,
    release: Notify,
}

impl GatedStore {
    fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

impl TranslationStore for GatedStore {
    fn find<'a>(
        &'a self,
        filter: &'a TranslationFilter,
    ) -> BoxFuture<'a, Result<Vec<TranslationRecord>>> {
        self.inner.find(filter)
    }

    fn upsert<'a>(
        &'a self,
        tenant_id: &'a str,
        key: &'a str,
        fields: &'a UpsertFields,
    ) -> BoxFuture<'a, Result<TranslationRecord>> {
        async move {
            let record = self.inner.upsert(tenant_id, key, fields).await?;
            if self.armed.swap(false, Ordering::SeqCst) {
                self.paused.notify_one();
                self.release.notified().await;
            }
            Ok(record)
        }
        .boxed()
    }
}

fn entry(key: &str, target: &str) -> NewTranslation {
    NewTranslation::new(key, "source", target, Category::Ui)
}

// ==================== Failed Writes ====================

#[tokio::test]
async fn test_failed_upsert_leaves_cache_unchanged() {
    let store = Arc::new(FlakyStore::default());
    let service = TranslationService::new(store.clone());

    service
        .add_translation("t1", &entry("greeting", "Привет"), None)
        .await
        .unwrap();

    store.set_down(true);
    let err = service
        .add_translation("t1", &entry("greeting", "phantom"), None)
        .await
        .unwrap_err();

    assert!(matches!(err, TranslationError::StoreUnavailable(_)));
    assert_eq!(service.get_translation("t1", "greeting").as_deref(), Some("Привет"));
}

#[tokio::test]
async fn test_failed_first_write_creates_no_segment() {
    let store = Arc::new(FlakyStore::default());
    store.set_down(true);
    let service = TranslationService::new(store.clone());

    assert!(service
        .add_translation("t1", &entry("greeting", "Привет"), None)
        .await
        .is_err());
    assert_eq!(service.get_translation("t1", "greeting"), None);
    assert!(!service.cache().contains_tenant("t1"));
}

#[tokio::test]
async fn test_import_continues_past_failed_entries() {
    let store = Arc::new(FlakyStore::default());
    store.fail_key("k2");
    let service = TranslationService::new(store.clone());

    let report = service
        .import_translations("t1", &[entry("k1", "1"), entry("k2", "2"), entry("k3", "3")])
        .await
        .unwrap();

    assert_eq!(report.count(), 2);
    assert_eq!(report.failed, 1);
    assert_eq!(service.get_translation("t1", "k1").as_deref(), Some("1"));
    assert_eq!(service.get_translation("t1", "k2"), None);
    assert_eq!(service.get_translation("t1", "k3").as_deref(), Some("3"));
}

#[tokio::test]
async fn test_import_with_store_down_keeps_old_segment() {
    let store = Arc::new(FlakyStore::default());
    let service = TranslationService::new(store.clone());
    service
        .add_translation("t1", &entry("k1", "old"), None)
        .await
        .unwrap();

    store.set_down(true);
    let err = service
        .import_translations("t1", &[entry("k1", "new")])
        .await
        .unwrap_err();

    assert!(matches!(err, TranslationError::StoreUnavailable(_)));
    assert_eq!(service.get_translation("t1", "k1").as_deref(), Some("old"));
}

#[tokio::test]
async fn test_warm_cache_failure_is_reported() {
    let store = Arc::new(FlakyStore::default());
    store.set_down(true);
    let service = TranslationService::new(store);

    let err = service.warm_cache("t1").await.unwrap_err();
    assert!(matches!(err, TranslationError::StoreUnavailable(_)));
}

// ==================== Concurrency ====================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_import_in_progress_is_not_visible_in_cache() {
    let store = Arc::new(GatedStore::default());
    let service = Arc::new(TranslationService::new(store.clone()));
    service
        .add_translation("t1", &entry("k1", "old"), None)
        .await
        .unwrap();

    store.arm();
    let import = {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            service
                .import_translations("t1", &[entry("k1", "new"), entry("k2", "two")])
                .await
        })
    };

    // First entry is durable, second not yet attempted.
    store.paused.notified().await;
    let stored = service.get_translation_record("t1", "k1").await.unwrap();
    assert_eq!(stored.target_text, "new");
    assert_eq!(service.get_translation("t1", "k1").as_deref(), Some("old"));
    assert_eq!(service.get_translation("t1", "k2"), None);

    store.release.notify_one();
    let report = import.await.expect("import panicked").unwrap();

    assert_eq!(report.count(), 2);
    assert_eq!(service.get_translation("t1", "k1").as_deref(), Some("new"));
    assert_eq!(service.get_translation("t1", "k2").as_deref(), Some("two"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tenants_match_sequential_result() {
    let service = Arc::new(TranslationService::new(Arc::new(MemoryStore::new())));

    let mut handles = Vec::new();
    for tenant in ["t1", "t2"] {
        for i in 0..50 {
            let service = Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                let key = format!("key-{}", i);
                let target = format!("{}-value-{}", tenant, i);
                service
                    .add_translation(tenant, &entry(&key, &target), None)
                    .await
                    .map(|_| ())
            }));
        }
    }
    for handle in handles {
        handle.await.expect("task panicked").expect("write failed");
    }

    for tenant in ["t1", "t2"] {
        let stored = service.get_translations(tenant, None).await.unwrap();
        assert_eq!(stored.len(), 50);
        for i in 0..50 {
            assert_eq!(
                service.get_translation(tenant, &format!("key-{}", i)),
                Some(format!("{}-value-{}", tenant, i))
            );
        }
    }
    assert_eq!(service.cache_report().entries, 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_see_partial_rebuild() {
    let service = Arc::new(TranslationService::new(Arc::new(MemoryStore::new())));
    let batch: Vec<_> = (0..200)
        .map(|i| entry(&format!("k{}", i), &format!("v{}", i)))
        .collect();
    service.import_translations("t1", &batch).await.unwrap();

    let reader = {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            for _ in 0..500 {
                // A segment is either absent or complete, never half-built.
                let size = service
                    .cache()
                    .with_segment("t1", |segment| segment.map(|s| s.len()));
                assert_eq!(size, Some(200));
                tokio::task::yield_now().await;
            }
        })
    };

    for _ in 0..20 {
        service.warm_cache("t1").await.unwrap();
    }
    reader.await.expect("reader panicked");
}
