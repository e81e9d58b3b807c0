//! Multi-tenant translation store with an in-memory lookup cache used to
//! translate CRM API response payloads.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod server;
pub mod service;
pub mod store;
pub mod translate;

pub use cache::{CacheReport, Segment, TranslationCache};
pub use error::{Result, TranslationError};
pub use models::{Category, NewTranslation, Provenance, TranslationRecord};
pub use service::TranslationService;
pub use store::{MemoryStore, TranslationStore};
