/// One rendered head element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadTag {
  Title { text: String },
  Meta { attrs: Vec<(String, String)> },
}

impl HeadTag {
  pub fn meta(attrs: &[(&str, &str)]) -> Self {
    HeadTag::Meta {
      attrs: attrs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
    }
  }
}

/// The rendered tag set for one target: a `<title>` plus `<meta>`
/// elements. An unresolvable target renders as the empty component.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeoHead {
  pub tags: Vec<HeadTag>,
}

impl SeoHead {
  pub fn empty() -> Self {
    Self::default()
  }

  pub fn is_empty(&self) -> bool {
    self.tags.is_empty()
  }

  /// Serialize the component to HTML, one element per line. All text and
  /// attribute values are escaped.
  pub fn to_html(&self) -> String {
    let mut out = String::new();
    for tag in &self.tags {
      match tag {
        HeadTag::Title { text } => {
          out.push_str("<title>");
          out.push_str(&escape_html(text));
          out.push_str("</title>\n");
        }
        HeadTag::Meta { attrs } => {
          out.push_str("<meta");
          for (name, value) in attrs {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape_html(value));
            out.push('"');
          }
          out.push_str(">\n");
        }
      }
    }
    out
  }
}

pub(crate) fn escape_html(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for ch in s.chars() {
    match ch {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#x27;"),
      c => out.push(c),
    }
  }
  out
}
