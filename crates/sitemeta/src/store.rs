use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use thiserror::Error;

use crate::setting::{Setting, Variables};

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("serialization: {0}")]
  Codec(#[from] serde_json::Error),

  #[error("backend: {0}")]
  Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
  pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Backend(Box::new(err))
  }
}

/// One persisted settings row. Composite primary key `(name, locale_code)`.
///
/// The engine creates rows when a node is registered and updates them on
/// admin saves; it never deletes them. `deleted_at` is reserved for the
/// admin layer's soft-delete.
#[derive(Debug, Clone, PartialEq)]
pub struct SeoSettingRow {
  pub name: String,
  pub locale_code: String,
  pub setting: Setting,
  pub variables: Variables,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub deleted_at: Option<DateTime<Utc>>,
}

impl SeoSettingRow {
  pub fn new(name: impl Into<String>, locale_code: impl Into<String>) -> Self {
    let now = Utc::now();
    Self {
      name: name.into(),
      locale_code: locale_code.into(),
      setting: Setting::default(),
      variables: Variables::new(),
      created_at: now,
      updated_at: now,
      deleted_at: None,
    }
  }

  /// URL-safe external identifier: `{name}_{locale_code}`.
  pub fn primary_slug(&self) -> String {
    format!("{}_{}", self.name, self.locale_code)
  }
}

/// Decode a `{name}_{locale_code}` slug. Splits on the last `_` so names
/// containing underscores stay intact (locale codes never carry one).
pub fn parse_primary_slug(slug: &str) -> Option<(&str, &str)> {
  slug.rsplit_once('_').filter(|(name, locale)| !name.is_empty() && !locale.is_empty())
}

/// Persistence behind the registry. One row per `(name, locale_code)`;
/// implementations must exclude soft-deleted rows from every read.
pub trait SettingStore: Send + Sync {
  /// Single-key fetch.
  fn load(&self, name: &str, locale: &str) -> Result<Option<SeoSettingRow>, StoreError>;

  /// Bulk fetch by name set at one locale, used by the resolver.
  fn list_by_names(&self, names: &[&str], locale: &str)
    -> Result<Vec<SeoSettingRow>, StoreError>;

  /// Insert a fresh row for every `(name, locale)` pair that does not
  /// already exist; existing rows are left untouched.
  fn provision_missing(&self, names: &[&str], locales: &[&str]) -> Result<(), StoreError>;

  /// Write-through save of the editable fields.
  fn upsert(
    &self,
    name: &str,
    locale: &str,
    setting: &Setting,
    variables: &Variables,
  ) -> Result<(), StoreError>;
}

/// In-process [`SettingStore`] keeping rows in a map. The reference store
/// for tests and demos; the SQLite implementation lives in the
/// `sitemeta-sqlite` crate.
#[derive(Default)]
pub struct MemoryStore {
  rows: RwLock<BTreeMap<(String, String), SeoSettingRow>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of live rows, soft-deleted ones excluded.
  pub fn len(&self) -> usize {
    self.rows.read().values().filter(|r| r.deleted_at.is_none()).count()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl SettingStore for MemoryStore {
  fn load(&self, name: &str, locale: &str) -> Result<Option<SeoSettingRow>, StoreError> {
    let rows = self.rows.read();
    Ok(
      rows
        .get(&(name.to_string(), locale.to_string()))
        .filter(|row| row.deleted_at.is_none())
        .cloned(),
    )
  }

  fn list_by_names(
    &self,
    names: &[&str],
    locale: &str,
  ) -> Result<Vec<SeoSettingRow>, StoreError> {
    let rows = self.rows.read();
    Ok(
      names
        .iter()
        .filter_map(|name| rows.get(&(name.to_string(), locale.to_string())))
        .filter(|row| row.deleted_at.is_none())
        .cloned()
        .collect(),
    )
  }

  fn provision_missing(&self, names: &[&str], locales: &[&str]) -> Result<(), StoreError> {
    let mut rows = self.rows.write();
    for name in names {
      for locale in locales {
        let key = (name.to_string(), locale.to_string());
        rows.entry(key).or_insert_with(|| SeoSettingRow::new(*name, *locale));
      }
    }
    Ok(())
  }

  fn upsert(
    &self,
    name: &str,
    locale: &str,
    setting: &Setting,
    variables: &Variables,
  ) -> Result<(), StoreError> {
    let mut rows = self.rows.write();
    let row = rows
      .entry((name.to_string(), locale.to_string()))
      .or_insert_with(|| SeoSettingRow::new(name, locale));
    row.setting = setting.clone();
    row.variables = variables.clone();
    row.updated_at = Utc::now();
    Ok(())
  }
}
