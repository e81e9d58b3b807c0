use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::TranslationError;

/// Where a translation string belongs in the CRM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Ui,
    Email,
    Report,
    Notification,
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Ui,
        Category::Email,
        Category::Report,
        Category::Notification,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Ui => "ui",
            Category::Email => "email",
            Category::Report => "report",
            Category::Notification => "notification",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = TranslationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| TranslationError::validation(format!("Unknown category: {}", s)))
    }
}

/// Who produced a translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    #[default]
    System,
    User,
    Crowdsourced,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::System => "system",
            Provenance::User => "user",
            Provenance::Crowdsourced => "crowdsourced",
        }
    }
}

impl FromStr for Provenance {
    type Err = TranslationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Provenance::System),
            "user" => Ok(Provenance::User),
            "crowdsourced" => Ok(Provenance::Crowdsourced),
            other => Err(TranslationError::validation(format!(
                "Unknown provenance: {}",
                other
            ))),
        }
    }
}

/// A durable translation owned by one tenant. `(tenant_id, key)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationRecord {
    pub tenant_id: String,
    pub key: String,
    pub source_text: String,
    pub target_text: String,
    pub category: Category,
    pub approved: bool,
    pub provenance: Provenance,
    pub votes: i32,
    pub last_editor: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Query filter for [`crate::store::TranslationStore::find`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslationFilter {
    pub tenant_id: String,
    pub key: Option<String>,
    pub category: Option<Category>,
}

impl TranslationFilter {
    pub fn tenant(tenant_id: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            ..Self::default()
        }
    }

    pub fn with_key(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }

    pub fn with_category(mut self, category: Option<Category>) -> Self {
        self.category = category;
        self
    }

    pub fn matches(&self, record: &TranslationRecord) -> bool {
        record.tenant_id == self.tenant_id
            && self.key.as_deref().map_or(true, |k| record.key == k)
            && self.category.map_or(true, |c| record.category == c)
    }
}

/// Fields written by an upsert.
///
/// Text and category always replace the stored values. `None` in the optional
/// fields keeps an existing record's value, or takes the default on insert.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertFields {
    pub source_text: String,
    pub target_text: String,
    pub category: Category,
    pub provenance: Option<Provenance>,
    pub approved: Option<bool>,
    pub last_editor: Option<String>,
}

/// Incoming translation as sent by a controller.
///
/// Accepts the legacy `english`/`russian` field names. Missing fields
/// deserialize as empty strings so validation can report them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewTranslation {
    #[serde(default)]
    pub key: String,
    #[serde(default, alias = "english")]
    pub source_text: String,
    #[serde(default, alias = "russian")]
    pub target_text: String,
    #[serde(default)]
    pub category: String,
}

impl NewTranslation {
    pub fn new(key: &str, source_text: &str, target_text: &str, category: Category) -> Self {
        Self {
            key: key.to_string(),
            source_text: source_text.to_string(),
            target_text: target_text.to_string(),
            category: category.as_str().to_string(),
        }
    }

    /// Check required fields and parse the category.
    pub fn validate(&self) -> Result<Category, TranslationError> {
        if self.key.trim().is_empty()
            || self.source_text.is_empty()
            || self.target_text.is_empty()
            || self.category.is_empty()
        {
            return Err(TranslationError::validation("Missing required fields"));
        }
        self.category.parse()
    }
}

/// Outcome of a best-effort batch import.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub imported: Vec<TranslationRecord>,
    pub failed: usize,
}

impl ImportReport {
    pub fn count(&self) -> usize {
        self.imported.len()
    }
}

/// Per-tenant aggregate used by the stats endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TranslationStats {
    pub total: usize,
    pub by_category: BTreeMap<Category, usize>,
    pub approved: usize,
    pub pending: usize,
}

impl TranslationStats {
    pub fn from_records(records: &[TranslationRecord]) -> Self {
        let mut stats = Self {
            total: records.len(),
            ..Self::default()
        };
        for record in records {
            *stats.by_category.entry(record.category).or_insert(0) += 1;
            if record.approved {
                stats.approved += 1;
            } else {
                stats.pending += 1;
            }
        }
        stats
    }
}
