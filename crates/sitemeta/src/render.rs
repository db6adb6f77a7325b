use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use url::Url;

use crate::builder::SeoBuilder;
use crate::errors::SeoError;
use crate::node::{SeoNodeId, VarContext};
use crate::request::RenderReq;
use crate::setting::{Setting, Variables};
use crate::store::SeoSettingRow;
use crate::tags::{HeadTag, SeoHead};
use crate::target::RenderTarget;

// {{name}}, name drawn from [A-Za-z0-9]+. No nesting, no escaping;
// unknown names expand to the empty string.
static PLACEHOLDER: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\{\{([A-Za-z0-9]+)\}\}").expect("placeholder pattern"));

const CANONICAL_OG_KEYS: [&str; 5] =
  ["og:title", "og:description", "og:url", "og:type", "og:image"];

impl SeoBuilder {
  /// Render the tag set for one target.
  ///
  /// A target that resolves to no node yields the empty component; store
  /// failures propagate.
  pub fn render<'a>(
    &self,
    target: impl Into<RenderTarget<'a>>,
    req: &RenderReq,
  ) -> Result<SeoHead, SeoError> {
    let target = target.into();
    let Some(node) = self.lookup(&target) else {
      debug!("render target resolves to no SEO node, emitting empty component");
      return Ok(SeoHead::empty());
    };
    let locale = self.locale_for(&target);
    let chain = self.arena.chain_from_root(node);
    let rows = self.chain_rows(&chain, &locale)?;
    Ok(self.render_resolved(node, &chain, &rows, &target, req))
  }

  /// Render the root node's tag set.
  pub fn render_global(&self, req: &RenderReq) -> Result<SeoHead, SeoError> {
    self.render(RenderTarget::Name(self.global_name()), req)
  }

  /// Render a homogeneous batch of targets with one request. The
  /// ancestor-chain rows are fetched once per locale and reused for
  /// every target in that locale.
  pub fn batch_render(
    &self,
    targets: &[RenderTarget<'_>],
    req: &RenderReq,
  ) -> Result<Vec<SeoHead>, SeoError> {
    let Some(first) = targets.first() else {
      return Ok(Vec::new());
    };
    let Some(node) = self.lookup(first) else {
      return Ok(vec![SeoHead::empty(); targets.len()]);
    };
    let chain = self.arena.chain_from_root(node);
    let mut rows_by_locale: HashMap<String, HashMap<String, SeoSettingRow>> = HashMap::new();
    let mut heads = Vec::with_capacity(targets.len());
    for target in targets {
      let locale = self.locale_for(target);
      if !rows_by_locale.contains_key(&locale) {
        let rows = self.chain_rows(&chain, &locale)?;
        rows_by_locale.insert(locale.clone(), rows);
      }
      heads.push(self.render_resolved(node, &chain, &rows_by_locale[&locale], target, req));
    }
    Ok(heads)
  }

  fn chain_rows(
    &self,
    chain: &[SeoNodeId],
    locale: &str,
  ) -> Result<HashMap<String, SeoSettingRow>, SeoError> {
    let names: Vec<&str> = chain.iter().map(|id| self.name_of(*id)).collect();
    let rows = self.store.list_by_names(&names, locale)?;
    Ok(rows.into_iter().map(|row| (row.name.clone(), row)).collect())
  }

  fn render_resolved(
    &self,
    node: SeoNodeId,
    chain: &[SeoNodeId],
    rows: &HashMap<String, SeoSettingRow>,
    target: &RenderTarget<'_>,
    req: &RenderReq,
  ) -> SeoHead {
    // Step 1: ancestor-chain merge, root first, descendant fields win
    // when non-empty. With inheritance off only the terminal row counts.
    let mut effective = Setting::default();
    if self.inherit {
      for id in chain {
        if let Some(row) = rows.get(self.name_of(*id)) {
          effective.merge_over(&row.setting);
        }
      }
    } else if let Some(row) = rows.get(self.name_of(node)) {
      effective.merge_over(&row.setting);
    }

    // Step 2: instance override, only when the instance opted in.
    if let Some(instance) = target.instance() {
      if let Some(own) = instance.seo_setting() {
        if own.enabled_customize {
          effective.merge_over(own);
        }
      }
    }

    // Step 3: stored variables root-to-leaf, then context functions.
    // The two namespaces are disjoint by registration-time checks.
    let mut vars = Variables::new();
    for id in chain {
      if let Some(row) = rows.get(self.name_of(*id)) {
        vars.extend(row.variables.iter().map(|(k, v)| (k.clone(), v.clone())));
      }
    }
    let views = self.arena.inherited(node);
    {
      let ctx = VarContext { target: target.instance(), setting: &effective, req };
      for (name, f) in &views.context_fns {
        vars.insert(name.clone(), f(&ctx));
      }
    }

    // Step 4: placeholder substitution.
    expand_setting(&mut effective, &vars);

    // Step 5: URL absolutization.
    if !effective.open_graph_url.is_empty() && !is_absolute_url(&effective.open_graph_url) {
      effective.open_graph_url = absolutize(&effective.open_graph_url, req);
    }

    // Step 6: Open Graph property mapping.
    let fn_props: BTreeMap<String, String> = {
      let ctx = VarContext { target: target.instance(), setting: &effective, req };
      views.og_fns.iter().map(|(prop, f)| (prop.clone(), f(&ctx))).collect()
    };
    let mut og = BTreeMap::from([
      ("og:title".to_string(), effective.open_graph_title.clone()),
      ("og:description".to_string(), effective.open_graph_description.clone()),
      ("og:url".to_string(), effective.open_graph_url.clone()),
      ("og:type".to_string(), effective.open_graph_type.clone()),
      ("og:image".to_string(), effective.open_graph_image_url.clone()),
    ]);
    for m in &effective.open_graph_metadata {
      og.insert(m.property.clone(), m.content.clone());
    }
    for key in CANONICAL_OG_KEYS {
      let value = og.entry(key.to_string()).or_default();
      if value.is_empty() {
        if let Some(computed) = fn_props.get(key) {
          value.clone_from(computed);
        }
      }
    }
    if og.get("og:type").is_none_or(|current| current.is_empty()) {
      og.insert("og:type".to_string(), "website".to_string());
    }
    for (prop, value) in &fn_props {
      og.entry(prop.clone()).or_insert_with(|| value.clone());
    }

    // Step 7: emission.
    let mut tags = vec![
      HeadTag::Title { text: effective.title.clone() },
      HeadTag::meta(&[("name", "description"), ("content", effective.description.as_str())]),
      HeadTag::meta(&[("name", "keywords"), ("content", effective.keywords.as_str())]),
    ];
    for (prop, content) in &og {
      tags.push(HeadTag::meta(&[
        ("property", prop.as_str()),
        ("name", prop.as_str()),
        ("content", content.as_str()),
      ]));
    }
    SeoHead { tags }
  }
}

fn expand(input: &str, vars: &Variables) -> String {
  PLACEHOLDER
    .replace_all(input, |caps: &regex::Captures<'_>| {
      vars.get(&caps[1]).cloned().unwrap_or_default()
    })
    .into_owned()
}

fn expand_setting(setting: &mut Setting, vars: &Variables) {
  for field in [
    &mut setting.title,
    &mut setting.description,
    &mut setting.keywords,
    &mut setting.open_graph_title,
    &mut setting.open_graph_description,
    &mut setting.open_graph_url,
    &mut setting.open_graph_type,
    &mut setting.open_graph_image_url,
  ] {
    *field = expand(field, vars);
  }
  for m in &mut setting.open_graph_metadata {
    m.content = expand(&m.content, vars);
  }
}

/// Absolute means the string parses as a URL carrying a host (a parse
/// failure also implies a missing scheme).
fn is_absolute_url(input: &str) -> bool {
  Url::parse(input).map(|url| url.has_host()).unwrap_or(false)
}

fn absolutize(path: &str, req: &RenderReq) -> String {
  let scheme = req.scheme_or_default();
  let host = req.host();
  if path.starts_with('/') {
    format!("{scheme}://{host}{path}")
  } else {
    format!("{scheme}://{host}/{path}")
  }
}
