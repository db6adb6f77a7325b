use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sitemeta::{
  MemoryStore, RenderReq, RenderTarget, SeoBuilder, SeoError, SeoOptions, SeoSettingRow,
  SeoTarget, Setting, SettingStore, StoreError, Variables,
};

fn vars(pairs: &[(&str, &str)]) -> Variables {
  pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// Root-only registry: `SiteName` setting variable plus an `og:url`
/// property computed from the request.
fn global_only() -> SeoBuilder {
  let mut seo = SeoBuilder::new(Arc::new(MemoryStore::new())).unwrap();
  let root = seo.global_seo();
  seo.register_setting_variables(root, &["SiteName"]).unwrap();
  seo.register_og_property(root, "og:url", |ctx| ctx.req.url().to_string()).unwrap();
  seo
    .save(
      "Global SEO",
      "en",
      Setting { title: "global | {{SiteName}}".into(), ..Setting::default() },
      vars(&[("SiteName", "Qor5 dev")]),
    )
    .unwrap();
  seo
}

#[test]
fn root_only_render() {
  let seo = global_only();
  let req = RenderReq::from_url("http://dev.qor5.com/product/1");
  let html = seo.render("Global SEO", &req).unwrap().to_html();
  assert!(html.contains("<title>global | Qor5 dev</title>"), "html: {html}");
  assert!(
    html.contains(
      r#"<meta property="og:url" name="og:url" content="http://dev.qor5.com/product/1">"#
    ),
    "html: {html}"
  );
}

#[test]
fn child_inherits_setting_variable_from_root() {
  let mut seo = global_only();
  seo.register_seo("Product").unwrap();
  seo
    .save(
      "Product",
      "en",
      Setting { title: "product | {{SiteName}}".into(), ..Setting::default() },
      Variables::new(),
    )
    .unwrap();

  let req = RenderReq::from_url("http://dev.qor5.com/product/1");
  let html = seo.render("Product", &req).unwrap().to_html();
  assert!(html.contains("<title>product | Qor5 dev</title>"), "html: {html}");
}

#[derive(Default)]
struct Product {
  #[allow(dead_code)]
  name: String,
  seo: Setting,
}

impl SeoTarget for Product {
  fn seo_setting(&self) -> Option<&Setting> {
    Some(&self.seo)
  }
}

#[test]
fn instance_override_with_inheritance() {
  let mut seo = global_only();
  seo.register_seo_for::<Product>("Product").unwrap();
  seo
    .save(
      "Product",
      "en",
      Setting { description: "product description".into(), ..Setting::default() },
      vars(&[("ProductTag", "Men")]),
    )
    .unwrap();

  let product = Product {
    name: "product 1".into(),
    seo: Setting {
      keywords: "shoes, {{ProductTag}}".into(),
      enabled_customize: true,
      ..Setting::default()
    },
  };
  let req = RenderReq::from_url("http://dev.qor5.com/product/1");
  let html = seo.render(&product as &dyn SeoTarget, &req).unwrap().to_html();
  assert!(html.contains("<title>global | Qor5 dev</title>"), "html: {html}");
  assert!(
    html.contains(r#"<meta name="description" content="product description">"#),
    "html: {html}"
  );
  assert!(html.contains(r#"<meta name="keywords" content="shoes, Men">"#), "html: {html}");
}

#[test]
fn instance_setting_is_ignored_without_opt_in() {
  let mut seo = global_only();
  seo.register_seo_for::<Product>("Product").unwrap();

  let product = Product {
    name: "product 1".into(),
    seo: Setting { title: "never shown".into(), ..Setting::default() },
  };
  let req = RenderReq::from_url("http://dev.qor5.com/product/1");
  let html = seo.render(&product as &dyn SeoTarget, &req).unwrap().to_html();
  assert!(html.contains("<title>global | Qor5 dev</title>"), "html: {html}");
}

#[test]
fn listing_sorts_arbitrary_row_order_preorder() {
  let mut seo = SeoBuilder::new(Arc::new(MemoryStore::new())).unwrap();
  let plp = seo.register_seo("PLP").unwrap();
  let children = seo.register_multiple_seo(&["Region", "City", "Prefecture"]).unwrap();
  seo.append_children(plp, &children).unwrap();
  seo.register_multiple_seo(&["Post", "Product"]).unwrap();

  let mut rows: Vec<SeoSettingRow> =
    ["Prefecture", "Product", "Global SEO", "City", "Post", "PLP", "Region"]
      .into_iter()
      .map(|name| SeoSettingRow::new(name, "en"))
      .collect();
  seo.sort_for_listing(&mut rows);
  let names: Vec<&str> = rows.iter().map(|row| row.name.as_str()).collect();
  assert_eq!(
    names,
    vec!["Global SEO", "PLP", "Region", "City", "Prefecture", "Post", "Product"]
  );
}

#[test]
fn reparenting_under_own_subtree_is_rejected() {
  let mut seo = SeoBuilder::new(Arc::new(MemoryStore::new())).unwrap();
  let a = seo.register_seo("A").unwrap();
  let b = seo.register_seo("B").unwrap();
  seo.set_parent(b, a).unwrap();

  assert!(matches!(seo.set_parent(a, b), Err(SeoError::Cycle(_))));
  // the tree is unchanged
  assert_eq!(seo.priority_of("A"), 2);
  assert_eq!(seo.priority_of("B"), 3);
}

#[test]
fn append_then_remove_restores_tree_shape() {
  let store = Arc::new(MemoryStore::new());
  let mut seo = SeoBuilder::new(store.clone()).unwrap();
  let post = seo.register_seo("Post").unwrap();
  let extra = seo.register_seo("Extra").unwrap();
  seo.append_children(post, &[extra]).unwrap();
  assert_eq!(seo.priority_of("Extra"), 3);

  seo.remove_seo("Extra").unwrap();
  assert_eq!(seo.get_seo("Extra"), None);
  assert_eq!(seo.priority_of("Post"), 2);
  let rows = seo.listing("en").unwrap();
  let names: Vec<&str> = rows.iter().map(|row| row.name.as_str()).collect();
  assert_eq!(names, vec!["Global SEO", "Post"]);
  // the removed node's persisted row survives
  assert!(store.load("Extra", "en").unwrap().is_some());
}

// A store that counts bulk fetches, for the batch-render contract.
struct CountingStore {
  inner: MemoryStore,
  list_calls: AtomicUsize,
}

impl CountingStore {
  fn new() -> Self {
    Self { inner: MemoryStore::new(), list_calls: AtomicUsize::new(0) }
  }
}

impl SettingStore for CountingStore {
  fn load(&self, name: &str, locale: &str) -> Result<Option<SeoSettingRow>, StoreError> {
    self.inner.load(name, locale)
  }

  fn list_by_names(&self, names: &[&str], locale: &str) -> Result<Vec<SeoSettingRow>, StoreError> {
    self.list_calls.fetch_add(1, Ordering::SeqCst);
    self.inner.list_by_names(names, locale)
  }

  fn provision_missing(&self, names: &[&str], locales: &[&str]) -> Result<(), StoreError> {
    self.inner.provision_missing(names, locales)
  }

  fn upsert(
    &self,
    name: &str,
    locale: &str,
    setting: &Setting,
    variables: &Variables,
  ) -> Result<(), StoreError> {
    self.inner.upsert(name, locale, setting, variables)
  }
}

#[derive(Default)]
struct LocalizedProduct {
  locale: String,
  seo: Setting,
}

impl SeoTarget for LocalizedProduct {
  fn seo_setting(&self) -> Option<&Setting> {
    Some(&self.seo)
  }

  fn seo_locale(&self) -> Option<String> {
    Some(self.locale.clone())
  }
}

#[test]
fn batch_render_uses_each_targets_locale_and_fetches_once_per_locale() {
  let store = Arc::new(CountingStore::new());
  let mut seo = SeoBuilder::with_options(
    store.clone(),
    SeoOptions { locales: vec!["en".into(), "zh".into()], ..SeoOptions::default() },
  )
  .unwrap();
  seo.register_seo_for::<LocalizedProduct>("Product").unwrap();
  for (locale, title) in [("en", "product-en"), ("zh", "product-zh")] {
    seo
      .save(
        "Product",
        locale,
        Setting { title: title.into(), ..Setting::default() },
        Variables::new(),
      )
      .unwrap();
  }

  let en = LocalizedProduct { locale: "en".into(), ..LocalizedProduct::default() };
  let zh = LocalizedProduct { locale: "zh".into(), ..LocalizedProduct::default() };
  let also_en = LocalizedProduct { locale: "en".into(), ..LocalizedProduct::default() };
  let req = RenderReq::from_url("http://dev.qor5.com/products");
  let heads = seo
    .batch_render(
      &[
        RenderTarget::Instance(&en),
        RenderTarget::Instance(&zh),
        RenderTarget::Instance(&also_en),
      ],
      &req,
    )
    .unwrap();

  assert_eq!(heads.len(), 3);
  assert!(heads[0].to_html().contains("<title>product-en</title>"));
  assert!(heads[1].to_html().contains("<title>product-zh</title>"));
  assert!(heads[2].to_html().contains("<title>product-en</title>"));
  // two locales, two chain fetches
  assert_eq!(store.list_calls.load(Ordering::SeqCst), 2);
}

#[test]
fn named_render_target_selects_its_locale() {
  let store = Arc::new(MemoryStore::new());
  let mut seo = SeoBuilder::with_options(
    store,
    SeoOptions { locales: vec!["en".into(), "zh".into()], ..SeoOptions::default() },
  )
  .unwrap();
  seo.register_seo("Product").unwrap();
  seo
    .save(
      "Product",
      "zh",
      Setting { title: "产品".into(), ..Setting::default() },
      Variables::new(),
    )
    .unwrap();

  let req = RenderReq::from_url("http://dev.qor5.com/product/1");
  let html = seo.render(RenderTarget::named("Product", "zh"), &req).unwrap().to_html();
  assert!(html.contains("<title>产品</title>"), "html: {html}");
}

// -- boundary behaviors --

#[test]
fn unregistered_target_renders_nothing() {
  let seo = global_only();
  let req = RenderReq::from_url("http://dev.qor5.com/");
  let head = seo.render("Unknown Page", &req).unwrap();
  assert!(head.is_empty());
  assert_eq!(head.to_html(), "");
}

#[test]
fn unknown_placeholder_expands_to_empty_string() {
  let mut seo = global_only();
  seo.register_seo("Landing").unwrap();
  seo
    .save(
      "Landing",
      "en",
      Setting { description: "made by {{NoSuchVar}}!".into(), ..Setting::default() },
      Variables::new(),
    )
    .unwrap();
  let req = RenderReq::from_url("http://dev.qor5.com/");
  let html = seo.render("Landing", &req).unwrap().to_html();
  assert!(html.contains(r#"<meta name="description" content="made by !">"#), "html: {html}");
}

#[test]
fn empty_og_url_emits_empty_content_without_functions() {
  let mut seo = SeoBuilder::new(Arc::new(MemoryStore::new())).unwrap();
  seo.register_seo("Bare").unwrap();
  let req = RenderReq::from_url("http://dev.qor5.com/");
  let html = seo.render("Bare", &req).unwrap().to_html();
  assert!(html.contains(r#"<meta property="og:url" name="og:url" content="">"#), "html: {html}");
}

#[test]
fn og_type_defaults_to_website() {
  let seo = global_only();
  let req = RenderReq::from_url("http://dev.qor5.com/");
  let html = seo.render("Global SEO", &req).unwrap().to_html();
  assert!(
    html.contains(r#"<meta property="og:type" name="og:type" content="website">"#),
    "html: {html}"
  );
}

#[test]
fn og_url_is_absolutized_against_the_request() {
  let mut seo = global_only();
  seo
    .save(
      "Global SEO",
      "en",
      Setting { open_graph_url: "/about".into(), ..Setting::default() },
      Variables::new(),
    )
    .unwrap();
  let req = RenderReq::from_url("https://dev.qor5.com/somewhere");
  let html = seo.render("Global SEO", &req).unwrap().to_html();
  assert!(
    html.contains(r#"<meta property="og:url" name="og:url" content="https://dev.qor5.com/about">"#),
    "html: {html}"
  );
}

#[test]
fn og_metadata_overlays_canonical_properties() {
  let mut seo = SeoBuilder::new(Arc::new(MemoryStore::new())).unwrap();
  seo.register_seo("Article").unwrap();
  seo
    .save(
      "Article",
      "en",
      Setting {
        open_graph_type: "article".into(),
        open_graph_metadata: vec![
          sitemeta::OpenGraphMetadata { property: "og:type".into(), content: "profile".into() },
          sitemeta::OpenGraphMetadata {
            property: "og:audio".into(),
            content: "http://cdn/a.mp3".into(),
          },
        ],
        ..Setting::default()
      },
      Variables::new(),
    )
    .unwrap();
  let req = RenderReq::from_url("http://dev.qor5.com/");
  let html = seo.render("Article", &req).unwrap().to_html();
  assert!(
    html.contains(r#"<meta property="og:type" name="og:type" content="profile">"#),
    "html: {html}"
  );
  assert!(
    html.contains(r#"<meta property="og:audio" name="og:audio" content="http://cdn/a.mp3">"#),
    "html: {html}"
  );
}

#[test]
fn disabling_inheritance_restricts_the_setting_cascade() {
  let store = Arc::new(MemoryStore::new());
  let mut seo = SeoBuilder::with_options(
    store,
    SeoOptions { inherit: false, ..SeoOptions::default() },
  )
  .unwrap();
  seo
    .save(
      "Global SEO",
      "en",
      Setting { title: "from root".into(), ..Setting::default() },
      Variables::new(),
    )
    .unwrap();
  seo.register_seo("Leaf").unwrap();
  seo
    .save(
      "Leaf",
      "en",
      Setting { description: "leaf only".into(), ..Setting::default() },
      Variables::new(),
    )
    .unwrap();

  let req = RenderReq::from_url("http://dev.qor5.com/");
  let html = seo.render("Leaf", &req).unwrap().to_html();
  assert!(html.contains("<title></title>"), "root title must not cascade: {html}");
  assert!(html.contains(r#"<meta name="description" content="leaf only">"#), "html: {html}");
}

#[test]
fn render_is_deterministic() {
  let seo = global_only();
  let req = RenderReq::from_url("http://dev.qor5.com/product/1");
  let first = seo.render("Global SEO", &req).unwrap();
  let second = seo.render("Global SEO", &req).unwrap();
  assert_eq!(first, second);
}

// A store whose reads fail, for the propagation contract.
struct FailingStore;

impl SettingStore for FailingStore {
  fn load(&self, _name: &str, _locale: &str) -> Result<Option<SeoSettingRow>, StoreError> {
    Err(StoreError::backend(std::io::Error::other("disk on fire")))
  }

  fn list_by_names(
    &self,
    _names: &[&str],
    _locale: &str,
  ) -> Result<Vec<SeoSettingRow>, StoreError> {
    Err(StoreError::backend(std::io::Error::other("disk on fire")))
  }

  fn provision_missing(&self, _names: &[&str], _locales: &[&str]) -> Result<(), StoreError> {
    Ok(())
  }

  fn upsert(
    &self,
    _name: &str,
    _locale: &str,
    _setting: &Setting,
    _variables: &Variables,
  ) -> Result<(), StoreError> {
    Ok(())
  }
}

#[test]
fn store_failures_propagate_from_render() {
  let seo = SeoBuilder::new(Arc::new(FailingStore)).unwrap();
  let req = RenderReq::from_url("http://dev.qor5.com/");
  let err = seo.render("Global SEO", &req).unwrap_err();
  assert!(matches!(err, SeoError::Store(_)));
}
