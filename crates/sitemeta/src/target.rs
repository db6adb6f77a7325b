use std::any::Any;

use crate::setting::Setting;

/// Capability implemented by application entities that participate in
/// SEO.
///
/// `seo_setting` exposes the embedded per-instance [`Setting`] (used for
/// the instance-override render step). `seo_locale` is the locale
/// provider: return the instance's locale, or `None` to fall back to the
/// registry default.
///
/// The `Any` supertrait lets the registry map an instance back to the
/// node registered for its concrete type without reflection on the
/// render path.
pub trait SeoTarget: Any {
  fn seo_setting(&self) -> Option<&Setting>;

  fn seo_locale(&self) -> Option<String> {
    None
  }
}

/// What callers pass to `render` and the lookup APIs. Resolution order:
/// an explicit `(name, locale)` pair, an instance mapped through its
/// registered type, or a plain node name.
#[derive(Clone, Copy)]
pub enum RenderTarget<'a> {
  Name(&'a str),
  Named { name: &'a str, locale: &'a str },
  Instance(&'a dyn SeoTarget),
}

impl<'a> RenderTarget<'a> {
  pub fn named(name: &'a str, locale: &'a str) -> Self {
    RenderTarget::Named { name, locale }
  }

  /// The instance behind this target, when there is one.
  pub fn instance(&self) -> Option<&'a dyn SeoTarget> {
    match self {
      RenderTarget::Instance(target) => Some(*target),
      _ => None,
    }
  }
}

impl<'a> From<&'a str> for RenderTarget<'a> {
  fn from(name: &'a str) -> Self {
    RenderTarget::Name(name)
  }
}

impl<'a> From<&'a dyn SeoTarget> for RenderTarget<'a> {
  fn from(target: &'a dyn SeoTarget) -> Self {
    RenderTarget::Instance(target)
  }
}
