//! Hierarchical, locale-aware SEO metadata engine.
//!
//! Operators configure SEO per entity class and per locale; application
//! code asks the engine to render the final `<title>`/`<meta>`/Open Graph
//! tag set for a concrete object at request time.
//!
//! The engine is a tree of named nodes ([`SeoBuilder`] owns the tree).
//! Each node has one persisted settings row per locale; at render time the
//! resolver walks from the target node to the root, merges settings and
//! variables (child wins per field / per key), expands `{{name}}` tokens,
//! computes Open Graph properties, and emits a [`SeoHead`] component.
//!
//! ```
//! use sitemeta::{MemoryStore, RenderReq, SeoBuilder, Setting, Variables};
//! use std::sync::Arc;
//!
//! let mut seo = SeoBuilder::new(Arc::new(MemoryStore::new()))?;
//! let root = seo.global_seo();
//! seo.register_setting_variables(root, &["SiteName"])?;
//! seo.save(
//!   "Global SEO",
//!   "en",
//!   Setting { title: "home | {{SiteName}}".into(), ..Setting::default() },
//!   Variables::from([("SiteName".to_string(), "Acme".to_string())]),
//! )?;
//!
//! let req = RenderReq::from_url("http://acme.dev/");
//! let head = seo.render("Global SEO", &req)?;
//! assert!(head.to_html().contains("<title>home | Acme</title>"));
//! # Ok::<(), sitemeta::SeoError>(())
//! ```

pub mod builder;
pub mod errors;
pub mod node;
pub mod render;
pub mod request;
pub mod setting;
pub mod store;
pub mod tags;
pub mod target;

// Re-exports for ergonomic use
pub use builder::{SeoBuilder, SeoOptions};
pub use errors::SeoError;
pub use node::{SeoNodeId, SeoVarFn, VarContext};
pub use request::RenderReq;
pub use setting::{
  og_metadata_from_csv, og_metadata_to_csv, MediaRef, OpenGraphMetadata, Setting, Variables,
};
pub use store::{parse_primary_slug, MemoryStore, SeoSettingRow, SettingStore, StoreError};
pub use tags::{HeadTag, SeoHead};
pub use target::{RenderTarget, SeoTarget};

/// Fallback locale used when a builder declares no locales.
pub const DEFAULT_LOCALE: &str = "en";

/// Name the root node carries unless renamed before registration.
pub const DEFAULT_GLOBAL_NAME: &str = "Global SEO";
