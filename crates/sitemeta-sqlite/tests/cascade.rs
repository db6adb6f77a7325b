use std::sync::Arc;

use sitemeta::{RenderReq, SeoBuilder, SeoOptions, Setting, Variables};
use sitemeta_sqlite::SqliteSettingStore;

#[test]
fn ancestor_cascade_renders_over_sqlite() {
  let store = Arc::new(SqliteSettingStore::open_in_memory().unwrap());
  let mut seo = SeoBuilder::with_options(
    store,
    SeoOptions { locales: vec!["en".into(), "zh".into()], ..SeoOptions::default() },
  )
  .unwrap();
  let root = seo.global_seo();
  seo.register_setting_variables(root, &["SiteName"]).unwrap();
  seo.register_seo("Product").unwrap();

  seo
    .save(
      "Global SEO",
      "en",
      Setting { title: "global | {{SiteName}}".into(), ..Setting::default() },
      Variables::from([("SiteName".to_string(), "Qor5 dev".to_string())]),
    )
    .unwrap();
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

  // the zh row was provisioned but never edited
  let zh_rows = seo.listing("zh").unwrap();
  assert_eq!(zh_rows.len(), 2);
  assert!(zh_rows.iter().all(|row| row.setting.is_empty()));
}
