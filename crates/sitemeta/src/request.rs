use std::collections::HashMap;

use url::Url;

/// The slice of an HTTP request the renderer consumes: host, scheme, the
/// full request URL, and query values. Adapter crates build this from
/// their framework's request type; `from_url` covers tests and
/// non-HTTP callers.
#[derive(Debug, Clone, Default)]
pub struct RenderReq {
  host: String,
  scheme: String,
  url: String,
  query: HashMap<String, String>,
}

impl RenderReq {
  pub fn new(
    host: impl Into<String>,
    scheme: impl Into<String>,
    url: impl Into<String>,
    query: HashMap<String, String>,
  ) -> Self {
    Self { host: host.into(), scheme: scheme.into(), url: url.into(), query }
  }

  /// Decompose a full URL string. An unparseable input keeps the raw
  /// string as `url()` with empty host and scheme.
  pub fn from_url(url: &str) -> Self {
    match Url::parse(url) {
      Ok(parsed) => Self {
        host: parsed.host_str().unwrap_or_default().to_string(),
        scheme: parsed.scheme().to_string(),
        url: url.to_string(),
        query: parsed.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect(),
      },
      Err(_) => Self { url: url.to_string(), ..Self::default() },
    }
  }

  pub fn host(&self) -> &str {
    &self.host
  }

  /// The request scheme, possibly empty.
  pub fn scheme(&self) -> &str {
    &self.scheme
  }

  /// The request scheme, with a missing scheme reported as `http`.
  pub fn scheme_or_default(&self) -> &str {
    if self.scheme.is_empty() {
      "http"
    } else {
      &self.scheme
    }
  }

  /// The original request URL, verbatim.
  pub fn url(&self) -> &str {
    &self.url
  }

  pub fn query(&self, key: &str) -> Option<&str> {
    self.query.get(key).map(String::as_str)
  }
}
