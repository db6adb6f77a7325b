//! SQLite-backed [`SettingStore`] for the sitemeta engine.
//!
//! One table, `qor_seo_settings`, keyed by `(name, locale_code)`, with
//! the setting and variable bag stored as JSON text. Reads exclude
//! soft-deleted rows; provisioning never touches existing rows.

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::debug;

use sitemeta::{SeoSettingRow, Setting, SettingStore, StoreError, Variables};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS qor_seo_settings (
  name        TEXT NOT NULL,
  locale_code TEXT NOT NULL DEFAULT 'en',
  setting     TEXT NOT NULL DEFAULT '{}',
  variables   TEXT NOT NULL DEFAULT '{}',
  created_at  TEXT NOT NULL,
  updated_at  TEXT NOT NULL,
  deleted_at  TEXT,
  PRIMARY KEY (name, locale_code)
);
CREATE INDEX IF NOT EXISTS idx_qor_seo_settings_deleted_at
  ON qor_seo_settings (deleted_at);
"#;

const ROW_COLUMNS: &str =
  "name, locale_code, setting, variables, created_at, updated_at, deleted_at";

pub struct SqliteSettingStore {
  conn: Mutex<Connection>,
}

impl SqliteSettingStore {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
    let conn = Connection::open(path).map_err(StoreError::backend)?;
    Self::with_connection(conn)
  }

  pub fn open_in_memory() -> Result<Self, StoreError> {
    let conn = Connection::open_in_memory().map_err(StoreError::backend)?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self, StoreError> {
    conn.execute_batch(SCHEMA).map_err(StoreError::backend)?;
    Ok(Self { conn: Mutex::new(conn) })
  }
}

fn decode_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
  Ok(RawRow {
    name: row.get(0)?,
    locale_code: row.get(1)?,
    setting: row.get(2)?,
    variables: row.get(3)?,
    created_at: row.get(4)?,
    updated_at: row.get(5)?,
    deleted_at: row.get(6)?,
  })
}

struct RawRow {
  name: String,
  locale_code: String,
  setting: String,
  variables: String,
  created_at: String,
  updated_at: String,
  deleted_at: Option<String>,
}

impl RawRow {
  fn into_row(self) -> Result<SeoSettingRow, StoreError> {
    let setting: Setting = serde_json::from_str(&self.setting)?;
    let variables: Variables = serde_json::from_str(&self.variables)?;
    Ok(SeoSettingRow {
      name: self.name,
      locale_code: self.locale_code,
      setting,
      variables,
      created_at: parse_timestamp(&self.created_at)?,
      updated_at: parse_timestamp(&self.updated_at)?,
      deleted_at: self.deleted_at.as_deref().map(parse_timestamp).transpose()?,
    })
  }
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, StoreError> {
  DateTime::parse_from_rfc3339(text)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(StoreError::backend)
}

impl SettingStore for SqliteSettingStore {
  fn load(&self, name: &str, locale: &str) -> Result<Option<SeoSettingRow>, StoreError> {
    let conn = self.conn.lock();
    let raw = conn
      .query_row(
        &format!(
          "SELECT {ROW_COLUMNS} FROM qor_seo_settings
           WHERE name = ?1 AND locale_code = ?2 AND deleted_at IS NULL"
        ),
        params![name, locale],
        decode_row,
      )
      .optional()
      .map_err(StoreError::backend)?;
    raw.map(RawRow::into_row).transpose()
  }

  fn list_by_names(&self, names: &[&str], locale: &str) -> Result<Vec<SeoSettingRow>, StoreError> {
    if names.is_empty() {
      return Ok(Vec::new());
    }
    let conn = self.conn.lock();
    let placeholders: Vec<String> = (0..names.len()).map(|i| format!("?{}", i + 2)).collect();
    let sql = format!(
      "SELECT {ROW_COLUMNS} FROM qor_seo_settings
       WHERE locale_code = ?1 AND deleted_at IS NULL AND name IN ({})",
      placeholders.join(",")
    );
    let mut stmt = conn.prepare(&sql).map_err(StoreError::backend)?;
    let values = std::iter::once(locale).chain(names.iter().copied());
    let raw_rows = stmt
      .query_map(params_from_iter(values), decode_row)
      .map_err(StoreError::backend)?
      .collect::<Result<Vec<_>, _>>()
      .map_err(StoreError::backend)?;
    raw_rows.into_iter().map(RawRow::into_row).collect()
  }

  fn provision_missing(&self, names: &[&str], locales: &[&str]) -> Result<(), StoreError> {
    let mut conn = self.conn.lock();
    let tx = conn.transaction().map_err(StoreError::backend)?;
    let now = Utc::now().to_rfc3339();
    for name in names {
      for locale in locales {
        tx.execute(
          r#"
          INSERT INTO qor_seo_settings (name, locale_code, setting, variables, created_at, updated_at)
          VALUES (?1, ?2, '{}', '{}', ?3, ?3)
          ON CONFLICT (name, locale_code) DO NOTHING
          "#,
          params![name, locale, now],
        )
        .map_err(StoreError::backend)?;
      }
    }
    tx.commit().map_err(StoreError::backend)?;
    debug!(?names, ?locales, "provisioned missing seo setting rows");
    Ok(())
  }

  fn upsert(
    &self,
    name: &str,
    locale: &str,
    setting: &Setting,
    variables: &Variables,
  ) -> Result<(), StoreError> {
    let setting_json = serde_json::to_string(setting)?;
    let variables_json = serde_json::to_string(variables)?;
    let now = Utc::now().to_rfc3339();
    let conn = self.conn.lock();
    conn
      .execute(
        r#"
        INSERT INTO qor_seo_settings (name, locale_code, setting, variables, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?5)
        ON CONFLICT (name, locale_code) DO UPDATE SET
          setting = excluded.setting,
          variables = excluded.variables,
          updated_at = excluded.updated_at
        "#,
        params![name, locale, setting_json, variables_json, now],
      )
      .map_err(StoreError::backend)?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample_setting() -> Setting {
    Setting {
      title: "product | {{SiteName}}".into(),
      open_graph_metadata: vec![sitemeta::OpenGraphMetadata {
        property: "og:audio".into(),
        content: "http://cdn/a.mp3".into(),
      }],
      ..Setting::default()
    }
  }

  #[test]
  fn provision_is_idempotent_and_preserves_edits() {
    let store = SqliteSettingStore::open_in_memory().unwrap();
    store.provision_missing(&["Global SEO", "Product"], &["en", "zh"]).unwrap();

    let edited = sample_setting();
    store.upsert("Product", "en", &edited, &Variables::new()).unwrap();
    store.provision_missing(&["Global SEO", "Product"], &["en", "zh"]).unwrap();

    let row = store.load("Product", "en").unwrap().unwrap();
    assert_eq!(row.setting, edited);
    let all = store.list_by_names(&["Global SEO", "Product"], "zh").unwrap();
    assert_eq!(all.len(), 2);
  }

  #[test]
  fn empty_setting_round_trips_as_empty_json_object() {
    let store = SqliteSettingStore::open_in_memory().unwrap();
    store.provision_missing(&["Bare"], &["en"]).unwrap();
    let raw: String = store
      .conn
      .lock()
      .query_row(
        "SELECT setting FROM qor_seo_settings WHERE name = 'Bare' AND locale_code = 'en'",
        [],
        |row| row.get(0),
      )
      .unwrap();
    assert_eq!(raw, "{}");
    let row = store.load("Bare", "en").unwrap().unwrap();
    assert!(row.setting.is_empty());
  }

  #[test]
  fn upsert_round_trips_setting_and_variables() {
    let store = SqliteSettingStore::open_in_memory().unwrap();
    let variables = Variables::from([("SiteName".to_string(), "Qor5 dev".to_string())]);
    store.upsert("Global SEO", "en", &sample_setting(), &variables).unwrap();

    let row = store.load("Global SEO", "en").unwrap().unwrap();
    assert_eq!(row.setting, sample_setting());
    assert_eq!(row.variables, variables);
    assert_eq!(row.primary_slug(), "Global SEO_en");
  }

  #[test]
  fn reads_exclude_soft_deleted_rows() {
    let store = SqliteSettingStore::open_in_memory().unwrap();
    store.provision_missing(&["Gone", "Kept"], &["en"]).unwrap();
    store
      .conn
      .lock()
      .execute(
        "UPDATE qor_seo_settings SET deleted_at = ?1 WHERE name = 'Gone'",
        params![Utc::now().to_rfc3339()],
      )
      .unwrap();

    assert!(store.load("Gone", "en").unwrap().is_none());
    let rows = store.list_by_names(&["Gone", "Kept"], "en").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "Kept");
  }

  #[test]
  fn rows_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("seo.db");
    {
      let store = SqliteSettingStore::open(&path).unwrap();
      store.upsert("Global SEO", "en", &sample_setting(), &Variables::new()).unwrap();
    }
    let store = SqliteSettingStore::open(&path).unwrap();
    let row = store.load("Global SEO", "en").unwrap().unwrap();
    assert_eq!(row.setting, sample_setting());
  }

  #[test]
  fn list_with_no_names_is_empty() {
    let store = SqliteSettingStore::open_in_memory().unwrap();
    assert!(store.list_by_names(&[], "en").unwrap().is_empty());
  }
}
