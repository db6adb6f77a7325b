use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::errors::SeoError;
use crate::node::{Arena, SeoNode, SeoNodeId, SeoVarFn, VarContext};
use crate::setting::{Setting, Variables};
use crate::store::{SeoSettingRow, SettingStore};
use crate::target::{RenderTarget, SeoTarget};
use crate::{DEFAULT_GLOBAL_NAME, DEFAULT_LOCALE};

/// Construction-time configuration. The locale set is fixed for the
/// lifetime of the builder; rows exist for exactly these locales (with
/// [`DEFAULT_LOCALE`] standing in when the list is empty).
pub struct SeoOptions {
  pub global_name: String,
  pub locales: Vec<String>,
  /// Whether ancestor rows contribute to the effective setting.
  pub inherit: bool,
}

impl Default for SeoOptions {
  fn default() -> Self {
    Self { global_name: DEFAULT_GLOBAL_NAME.to_string(), locales: Vec::new(), inherit: true }
  }
}

type AfterSaveFn =
  Box<dyn Fn(&str, &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> + Send + Sync>;

/// The SEO registry: owns the node tree, the name and entity-type maps,
/// and the handle to the settings store.
///
/// Build and configure it once at process start; the render path
/// traverses the tree without locking, so structural mutations after
/// startup require external happens-before ordering with concurrent
/// renders.
pub struct SeoBuilder {
  pub(crate) arena: Arena,
  pub(crate) root: SeoNodeId,
  pub(crate) names: HashMap<String, SeoNodeId>,
  pub(crate) types: HashMap<TypeId, SeoNodeId>,
  pub(crate) locales: Vec<String>,
  pub(crate) inherit: bool,
  pub(crate) store: Arc<dyn SettingStore>,
  pub(crate) after_save: Option<AfterSaveFn>,
}

impl SeoBuilder {
  pub fn new(store: Arc<dyn SettingStore>) -> Result<Self, SeoError> {
    Self::with_options(store, SeoOptions::default())
  }

  pub fn with_options(store: Arc<dyn SettingStore>, options: SeoOptions) -> Result<Self, SeoError> {
    let global_name = options.global_name.trim().to_string();
    if global_name.is_empty() {
      return Err(SeoError::EmptyName);
    }
    let mut arena = Arena::new();
    let root = arena.insert(SeoNode::new(global_name.clone()));
    let mut builder = Self {
      arena,
      root,
      names: HashMap::from([(global_name.clone(), root)]),
      types: HashMap::new(),
      locales: options.locales,
      inherit: options.inherit,
      store,
      after_save: None,
    };
    builder.provision(&[global_name.as_str()])?;
    Ok(builder)
  }

  // -- accessors --

  pub fn global_seo(&self) -> SeoNodeId {
    self.root
  }

  pub fn global_name(&self) -> &str {
    &self.arena.node(self.root).name
  }

  pub fn locales(&self) -> &[String] {
    &self.locales
  }

  /// The declared locales, or the fallback locale when none were
  /// declared.
  pub(crate) fn effective_locales(&self) -> Vec<&str> {
    if self.locales.is_empty() {
      vec![DEFAULT_LOCALE]
    } else {
      self.locales.iter().map(String::as_str).collect()
    }
  }

  pub fn default_locale(&self) -> &str {
    self.locales.first().map(String::as_str).unwrap_or(DEFAULT_LOCALE)
  }

  pub fn name_of(&self, id: SeoNodeId) -> &str {
    &self.arena.node(id).name
  }

  pub fn display_name_of(&self, id: SeoNodeId) -> &str {
    &self.arena.node(id).display_name
  }

  pub fn set_display_name(&mut self, id: SeoNodeId, display_name: impl Into<String>) {
    self.arena.set_display_name(id, display_name.into());
  }

  // -- registration --

  /// Register a name-only SEO node under the root and provision its
  /// settings rows across the declared locales.
  pub fn register_seo(&mut self, name: &str) -> Result<SeoNodeId, SeoError> {
    self.register_named_node(name, None)
  }

  pub fn register_multiple_seo(&mut self, names: &[&str]) -> Result<Vec<SeoNodeId>, SeoError> {
    names.iter().map(|name| self.register_seo(name)).collect()
  }

  /// Register an SEO node bound to an entity type. Instances of `T`
  /// passed to `render` resolve to this node. The type must expose its
  /// embedded [`Setting`] through the [`SeoTarget`] capability; a
  /// capability that yields nothing is rejected.
  pub fn register_seo_for<T>(&mut self, name: &str) -> Result<SeoNodeId, SeoError>
  where
    T: SeoTarget + Default + 'static,
  {
    let type_id = TypeId::of::<T>();
    if self.types.contains_key(&type_id) {
      return Err(SeoError::DuplicateType(std::any::type_name::<T>()));
    }
    if T::default().seo_setting().is_none() {
      return Err(SeoError::MissingSettingField(std::any::type_name::<T>()));
    }
    let id = self.register_named_node(name, Some(type_id))?;
    self.types.insert(type_id, id);
    Ok(id)
  }

  fn register_named_node(
    &mut self,
    name: &str,
    bound_type: Option<TypeId>,
  ) -> Result<SeoNodeId, SeoError> {
    let name = name.trim();
    if name.is_empty() {
      return Err(SeoError::EmptyName);
    }
    if self.names.contains_key(name) {
      return Err(SeoError::DuplicateName(name.to_string()));
    }
    let mut node = SeoNode::new(name);
    node.bound_type = bound_type;
    let id = self.arena.insert(node);
    self.arena.set_parent(id, self.root)?;
    self.names.insert(name.to_string(), id);
    self.provision(&[name])?;
    Ok(id)
  }

  fn provision(&self, names: &[&str]) -> Result<(), SeoError> {
    let locales = self.effective_locales();
    debug!(?names, ?locales, "provisioning seo setting rows");
    self.store.provision_missing(names, &locales)?;
    Ok(())
  }

  // -- variable registration --

  /// Declare setting-variable names on a node. Values come from the
  /// stored row's variable bag and substitute into `{{name}}` tokens.
  pub fn register_setting_variables(
    &mut self,
    id: SeoNodeId,
    names: &[&str],
  ) -> Result<(), SeoError> {
    self.arena.register_setting_variables(id, names)
  }

  /// Register a context variable: its value is computed per request and
  /// substitutes into `{{name}}` tokens. Redefining a name inherited
  /// from an ancestor overrides it on this subtree.
  pub fn register_context_variable(
    &mut self,
    id: SeoNodeId,
    name: &str,
    f: impl Fn(&VarContext<'_>) -> String + Send + Sync + 'static,
  ) -> Result<(), SeoError> {
    self.arena.register_context_variable(id, name, Arc::new(f) as SeoVarFn)
  }

  /// Register an Open Graph property function; the property name must
  /// contain `:`. Its value contributes to the emitted OG tags, not to
  /// placeholder substitution.
  pub fn register_og_property(
    &mut self,
    id: SeoNodeId,
    prop: &str,
    f: impl Fn(&VarContext<'_>) -> String + Send + Sync + 'static,
  ) -> Result<(), SeoError> {
    self.arena.register_og_property(id, prop, Arc::new(f) as SeoVarFn)
  }

  /// Every variable name usable in `{{…}}` tokens at this node: the
  /// setting and context names declared on the node and its ancestors.
  /// The admin editor surfaces these next to the template fields.
  pub fn available_variable_names(&self, id: SeoNodeId) -> Vec<String> {
    self.arena.inherited(id).available_names.iter().cloned().collect()
  }

  // -- structural operations --

  pub fn set_parent(&mut self, id: SeoNodeId, new_parent: SeoNodeId) -> Result<(), SeoError> {
    self.arena.set_parent(id, new_parent)
  }

  pub fn append_children(
    &mut self,
    id: SeoNodeId,
    children: &[SeoNodeId],
  ) -> Result<(), SeoError> {
    self.arena.append_children(id, children)
  }

  /// Remove a node from the tree: its children are reparented to its
  /// parent and its name/type map entries are dropped. Persisted rows
  /// are kept. Removing the root, or an unknown target, is a no-op.
  pub fn remove_seo<'a>(&mut self, target: impl Into<RenderTarget<'a>>) -> Result<(), SeoError> {
    let Some(id) = self.lookup(&target.into()) else {
      return Ok(());
    };
    if id == self.root {
      return Ok(());
    }
    self.arena.remove_self(id)?;
    let node = self.arena.node(id);
    let name = node.name.clone();
    let bound_type = node.bound_type;
    self.names.remove(&name);
    if let Some(type_id) = bound_type {
      self.types.remove(&type_id);
    }
    Ok(())
  }

  // -- lookup --

  /// Resolve a target to its node: explicit `(name, locale)` first, then
  /// the instance's registered type, then a plain name.
  pub fn get_seo<'a>(&self, target: impl Into<RenderTarget<'a>>) -> Option<SeoNodeId> {
    self.lookup(&target.into())
  }

  pub(crate) fn lookup(&self, target: &RenderTarget<'_>) -> Option<SeoNodeId> {
    match target {
      RenderTarget::Named { name, .. } | RenderTarget::Name(name) => {
        self.names.get(name.trim()).copied()
      }
      RenderTarget::Instance(instance) => {
        // Upcast first: type_id on the upcast object dispatches through
        // the vtable and reports the concrete type.
        let any: &dyn Any = *instance;
        self.types.get(&any.type_id()).copied()
      }
    }
  }

  /// Locale for a target: an explicit render-target locale or the
  /// instance's locale provider, falling back to the registry default.
  pub(crate) fn locale_for(&self, target: &RenderTarget<'_>) -> String {
    let provided = match target {
      RenderTarget::Named { locale, .. } => Some(locale.to_string()),
      RenderTarget::Instance(instance) => instance.seo_locale(),
      RenderTarget::Name(_) => None,
    };
    match provided {
      Some(locale) if !locale.is_empty() => locale,
      _ => self.default_locale().to_string(),
    }
  }

  // -- listing --

  /// Depth of a target's node: the root is 1, its children 2, and so on.
  /// Unresolvable targets report 0. The admin listing uses this to
  /// indent rows.
  pub fn priority_of<'a>(&self, target: impl Into<RenderTarget<'a>>) -> usize {
    match self.lookup(&target.into()) {
      Some(id) => self.arena.depth(id),
      None => 0,
    }
  }

  /// Stable pre-order sort of the provided rows by their node's position
  /// in the tree. Rows naming unregistered nodes keep their relative
  /// order at the end.
  pub fn sort_for_listing(&self, rows: &mut [SeoSettingRow]) {
    let order: HashMap<&str, usize> = self
      .arena
      .preorder(self.root)
      .into_iter()
      .enumerate()
      .map(|(index, id)| (self.arena.node(id).name.as_str(), index))
      .collect();
    rows.sort_by_key(|row| order.get(row.name.as_str()).copied().unwrap_or(usize::MAX));
  }

  /// Admin listing for one locale: provisions any row still missing for
  /// a registered node, then returns all rows in tree pre-order.
  pub fn listing(&self, locale: &str) -> Result<Vec<SeoSettingRow>, SeoError> {
    let ids = self.arena.preorder(self.root);
    let names: Vec<&str> = ids.iter().map(|id| self.arena.node(*id).name.as_str()).collect();
    self.store.provision_missing(&names, &[locale])?;
    let mut rows = self.store.list_by_names(&names, locale)?;
    self.sort_for_listing(&mut rows);
    Ok(rows)
  }

  // -- admin save --

  /// Install a hook invoked after every successful save. The hook runs
  /// after the row is written and before `save` returns; a hook error
  /// surfaces to the caller even though the write already committed
  /// (at-least-once notification).
  pub fn after_save(
    &mut self,
    f: impl Fn(&str, &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
      + Send
      + Sync
      + 'static,
  ) {
    self.after_save = Some(Box::new(f));
  }

  /// Write-through save of one row's editable fields. The row must have
  /// been provisioned (new rows cannot be created post-startup).
  pub fn save(
    &self,
    name: &str,
    locale: &str,
    setting: Setting,
    variables: Variables,
  ) -> Result<(), SeoError> {
    if self.store.load(name, locale)?.is_none() {
      return Err(SeoError::NotFound { name: name.to_string(), locale: locale.to_string() });
    }
    self.store.upsert(name, locale, &setting, &variables)?;
    debug!(name, locale, "seo setting saved");
    if let Some(hook) = &self.after_save {
      hook(name, locale).map_err(SeoError::AfterSave)?;
    }
    Ok(())
  }

  /// Rename the root. Allowed only while the root is the sole registered
  /// node.
  pub fn rename_global(&mut self, name: &str) -> Result<(), SeoError> {
    if self.names.len() > 1 {
      return Err(SeoError::RootRenameAfterRegistration);
    }
    let name = name.trim();
    if name.is_empty() {
      return Err(SeoError::EmptyName);
    }
    let old = self.global_name().to_string();
    if name == old {
      return Ok(());
    }
    self.arena.rename(self.root, name);
    self.names.remove(&old);
    self.names.insert(name.to_string(), self.root);
    self.provision(&[name])
  }
}
