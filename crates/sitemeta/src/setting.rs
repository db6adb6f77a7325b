use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// User-provided `name -> value` substitutions stored next to a setting
/// row. Persisted as one JSON object.
pub type Variables = BTreeMap<String, String>;

/// One Open Graph `<meta>` entry beyond the five canonical properties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenGraphMetadata {
  #[serde(rename = "Property")]
  pub property: String,
  #[serde(rename = "Content")]
  pub content: String,
}

/// Opaque reference to a media-library asset carrying a URL.
///
/// The engine never talks to media storage; it only derives style
/// variants from the stored URL. The renderer requests the `"og"` style.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
  #[serde(rename = "Url", default, skip_serializing_if = "String::is_empty")]
  pub url: String,
  #[serde(rename = "Description", default, skip_serializing_if = "String::is_empty")]
  pub description: String,
}

impl MediaRef {
  pub fn is_empty(&self) -> bool {
    self.url.is_empty()
  }

  /// The URL of the requested style variant, derived as
  /// `{stem}.{style}{ext}` from the stored URL. Empty style yields the
  /// bare URL; an empty reference yields `""`.
  pub fn url(&self, style: &str) -> String {
    if self.url.is_empty() {
      return String::new();
    }
    if style.is_empty() {
      return self.url.clone();
    }
    let last_segment = self.url.rfind('/').map_or(0, |i| i + 1);
    match self.url[last_segment..].rfind('.') {
      Some(dot) => {
        let (stem, ext) = self.url.split_at(last_segment + dot);
        format!("{stem}.{style}{ext}")
      }
      None => format!("{}.{style}", self.url),
    }
  }
}

/// The editable template record behind one SEO node at one locale.
///
/// Every string field may contain `{{name}}` placeholder tokens. The
/// record round-trips to a single JSON blob for persistence; an empty
/// setting serializes to `{}`. JSON keys keep their historical spelling
/// so existing rows stay readable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Setting {
  #[serde(rename = "Title", default, skip_serializing_if = "String::is_empty")]
  pub title: String,
  #[serde(rename = "Description", default, skip_serializing_if = "String::is_empty")]
  pub description: String,
  #[serde(rename = "Keywords", default, skip_serializing_if = "String::is_empty")]
  pub keywords: String,
  #[serde(rename = "OpenGraphTitle", default, skip_serializing_if = "String::is_empty")]
  pub open_graph_title: String,
  #[serde(rename = "OpenGraphDescription", default, skip_serializing_if = "String::is_empty")]
  pub open_graph_description: String,
  #[serde(rename = "OpenGraphURL", default, skip_serializing_if = "String::is_empty")]
  pub open_graph_url: String,
  #[serde(rename = "OpenGraphType", default, skip_serializing_if = "String::is_empty")]
  pub open_graph_type: String,
  #[serde(rename = "OpenGraphImageURL", default, skip_serializing_if = "String::is_empty")]
  pub open_graph_image_url: String,
  #[serde(rename = "OpenGraphImageFromMediaLibrary", default, skip_serializing_if = "MediaRef::is_empty")]
  pub open_graph_image_from_media_library: MediaRef,
  #[serde(rename = "OpenGraphMetadata", default, skip_serializing_if = "Vec::is_empty")]
  pub open_graph_metadata: Vec<OpenGraphMetadata>,
  #[serde(rename = "EnabledCustomize", default, skip_serializing_if = "std::ops::Not::not")]
  pub enabled_customize: bool,
}

impl Setting {
  /// True iff every string field is empty, the media reference carries no
  /// URL, and the metadata list is empty. `enabled_customize` does not
  /// count.
  pub fn is_empty(&self) -> bool {
    self.title.is_empty()
      && self.description.is_empty()
      && self.keywords.is_empty()
      && self.open_graph_title.is_empty()
      && self.open_graph_description.is_empty()
      && self.open_graph_url.is_empty()
      && self.open_graph_type.is_empty()
      && self.open_graph_image_url.is_empty()
      && self.open_graph_image_from_media_library.is_empty()
      && self.open_graph_metadata.is_empty()
  }

  /// Overlay `stronger` on top of `self`, field by field: a field of
  /// `stronger` wins whenever it is non-empty. The media reference's
  /// `"og"` style acts as a fallback source for `open_graph_image_url`
  /// when the explicit field is empty.
  pub fn merge_over(&mut self, stronger: &Setting) {
    fn put(dst: &mut String, src: &str) {
      if !src.is_empty() {
        *dst = src.to_string();
      }
    }
    put(&mut self.title, &stronger.title);
    put(&mut self.description, &stronger.description);
    put(&mut self.keywords, &stronger.keywords);
    put(&mut self.open_graph_title, &stronger.open_graph_title);
    put(&mut self.open_graph_description, &stronger.open_graph_description);
    put(&mut self.open_graph_url, &stronger.open_graph_url);
    put(&mut self.open_graph_type, &stronger.open_graph_type);
    if !stronger.open_graph_image_url.is_empty() {
      self.open_graph_image_url = stronger.open_graph_image_url.clone();
    } else {
      let og_variant = stronger.open_graph_image_from_media_library.url("og");
      if !og_variant.is_empty() {
        self.open_graph_image_url = og_variant;
      }
    }
    if !stronger.open_graph_image_from_media_library.is_empty() {
      self.open_graph_image_from_media_library =
        stronger.open_graph_image_from_media_library.clone();
    }
    if !stronger.open_graph_metadata.is_empty() {
      self.open_graph_metadata = stronger.open_graph_metadata.clone();
    }
  }
}

/// Parse the admin UI's two-column CSV (`Property,Content` per row) into
/// a metadata list. Rows with a different column count are skipped; a
/// malformed input yields an empty list.
pub fn og_metadata_from_csv(input: &str) -> Vec<OpenGraphMetadata> {
  let mut reader = csv::ReaderBuilder::new()
    .has_headers(false)
    .flexible(true)
    .from_reader(input.as_bytes());
  let mut metadata = Vec::new();
  for record in reader.records() {
    let Ok(record) = record else {
      return Vec::new();
    };
    if record.len() != 2 {
      continue;
    }
    metadata.push(OpenGraphMetadata {
      property: record[0].to_string(),
      content: record[1].to_string(),
    });
  }
  metadata
}

/// Serialize a metadata list to the admin UI's two-column CSV form,
/// preserving row order.
pub fn og_metadata_to_csv(metadata: &[OpenGraphMetadata]) -> String {
  let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
  for m in metadata {
    if writer.write_record([m.property.as_str(), m.content.as_str()]).is_err() {
      return String::new();
    }
  }
  writer
    .into_inner()
    .ok()
    .and_then(|buf| String::from_utf8(buf).ok())
    .unwrap_or_default()
}
