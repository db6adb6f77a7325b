use crate::store::StoreError;
use thiserror::Error;

/// Errors surfaced by registration, structural tree operations, and
/// rendering.
///
/// Configuration-time variants are contract violations of programmer
/// input; the engine never retries or recovers from them. `Store` wraps
/// persistence failures unchanged. `NotFound` is only returned from
/// operations where the caller asked for a specific row or node; the
/// renderer itself degrades a missing target to an empty [`crate::SeoHead`]
/// instead of erroring.
#[derive(Debug, Error)]
pub enum SeoError {
  #[error("SEO name must not be empty")]
  EmptyName,

  #[error("SEO {0:?} is already registered")]
  DuplicateName(String),

  #[error("entity type {0} is already registered")]
  DuplicateType(&'static str),

  #[error("entity type {0} exposes no embedded Setting")]
  MissingSettingField(&'static str),

  #[error("cannot assign a descendant as the parent of {0:?}")]
  Cycle(String),

  #[error("variable {name:?} conflicts with a {kind} variable declared on {node:?}")]
  VariableConflict { name: String, kind: &'static str, node: String },

  #[error("invalid variable name {0:?}: {1}")]
  InvalidVariableName(String, &'static str),

  #[error("OG property {0:?} is already registered on {1:?}")]
  DuplicateOgProperty(String, String),

  #[error("unknown SEO node handle")]
  UnknownNode,

  #[error("no SEO row for {name:?} at locale {locale:?}")]
  NotFound { name: String, locale: String },

  #[error("the global SEO can only be renamed before other registrations")]
  RootRenameAfterRegistration,

  #[error("after-save hook: {0}")]
  AfterSave(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error(transparent)]
  Store(#[from] StoreError),
}
