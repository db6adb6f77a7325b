use std::any::TypeId;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock};

use crate::errors::SeoError;
use crate::request::RenderReq;
use crate::setting::Setting;
use crate::target::SeoTarget;

/// Arguments handed to context-variable and OG-property functions.
///
/// `target` is the instance being rendered when there is one (name-based
/// targets carry no instance). `setting` is the effective setting before
/// placeholder substitution.
pub struct VarContext<'a> {
  pub target: Option<&'a dyn SeoTarget>,
  pub setting: &'a Setting,
  pub req: &'a RenderReq,
}

/// A user-supplied function computing a context variable or an Open
/// Graph property per request.
pub type SeoVarFn = Arc<dyn Fn(&VarContext<'_>) -> String + Send + Sync>;

/// Handle to a node inside a [`crate::SeoBuilder`]'s tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeoNodeId(pub(crate) usize);

#[derive(Clone, Copy, PartialEq)]
pub(crate) enum VarKind {
  Setting,
  Context,
}

/// Inherited views of a node, memoized per node and discarded wholesale
/// on any structural or registration change.
pub(crate) struct InheritedViews {
  /// This node's context functions plus every ancestor name not already
  /// present; child wins by traversal order.
  pub(crate) context_fns: BTreeMap<String, SeoVarFn>,
  /// Same algorithm for OG-property functions.
  pub(crate) og_fns: BTreeMap<String, SeoVarFn>,
  /// Union of setting and context variable names visible at this node.
  pub(crate) available_names: BTreeSet<String>,
}

pub(crate) struct SeoNode {
  pub(crate) name: String,
  pub(crate) display_name: String,
  pub(crate) bound_type: Option<TypeId>,
  pub(crate) parent: Option<SeoNodeId>,
  pub(crate) children: Vec<SeoNodeId>,
  pub(crate) setting_vars: BTreeSet<String>,
  pub(crate) context_vars: BTreeMap<String, SeoVarFn>,
  pub(crate) og_props: BTreeMap<String, SeoVarFn>,
  /// A node removed from the tree stays in the arena but rejects reuse.
  pub(crate) detached: bool,
  pub(crate) inherited: OnceLock<InheritedViews>,
}

impl SeoNode {
  pub(crate) fn new(name: impl Into<String>) -> Self {
    let name = name.into();
    Self {
      display_name: name.clone(),
      name,
      bound_type: None,
      parent: None,
      children: Vec::new(),
      setting_vars: BTreeSet::new(),
      context_vars: BTreeMap::new(),
      og_props: BTreeMap::new(),
      detached: false,
      inherited: OnceLock::new(),
    }
  }
}

/// Node storage. Parent links are handles (lookup only); a node owns its
/// children exclusively through the child handle list.
pub(crate) struct Arena {
  nodes: Vec<SeoNode>,
}

impl Arena {
  pub(crate) fn new() -> Self {
    Self { nodes: Vec::new() }
  }

  pub(crate) fn insert(&mut self, node: SeoNode) -> SeoNodeId {
    self.nodes.push(node);
    SeoNodeId(self.nodes.len() - 1)
  }

  pub(crate) fn node(&self, id: SeoNodeId) -> &SeoNode {
    &self.nodes[id.0]
  }

  fn live(&self, id: SeoNodeId) -> Result<&SeoNode, SeoError> {
    self.nodes.get(id.0).filter(|n| !n.detached).ok_or(SeoError::UnknownNode)
  }

  pub(crate) fn rename(&mut self, id: SeoNodeId, name: &str) {
    let node = &mut self.nodes[id.0];
    if node.display_name == node.name {
      node.display_name = name.to_string();
    }
    node.name = name.to_string();
  }

  pub(crate) fn set_display_name(&mut self, id: SeoNodeId, display_name: String) {
    self.nodes[id.0].display_name = display_name;
  }

  // -- traversal --

  /// Handles from `id` up to the root, inclusive.
  pub(crate) fn chain_to_root(&self, id: SeoNodeId) -> Vec<SeoNodeId> {
    let mut chain = Vec::new();
    let mut cursor = Some(id);
    while let Some(c) = cursor {
      chain.push(c);
      cursor = self.nodes[c.0].parent;
    }
    chain
  }

  /// Handles from the root down to `id`, inclusive.
  pub(crate) fn chain_from_root(&self, id: SeoNodeId) -> Vec<SeoNodeId> {
    let mut chain = self.chain_to_root(id);
    chain.reverse();
    chain
  }

  /// Pre-order traversal of the subtree rooted at `id`: parent before
  /// children, children in insertion order.
  pub(crate) fn preorder(&self, id: SeoNodeId) -> Vec<SeoNodeId> {
    let mut out = Vec::new();
    let mut stack = vec![id];
    while let Some(c) = stack.pop() {
      out.push(c);
      for child in self.nodes[c.0].children.iter().rev() {
        stack.push(*child);
      }
    }
    out
  }

  pub(crate) fn depth(&self, id: SeoNodeId) -> usize {
    self.chain_to_root(id).len()
  }

  // -- structural operations --

  pub(crate) fn set_parent(&mut self, id: SeoNodeId, new_parent: SeoNodeId) -> Result<(), SeoError> {
    self.live(id)?;
    self.live(new_parent)?;
    if self.nodes[id.0].parent == Some(new_parent) {
      return Ok(());
    }
    // Reject cycles: the new parent must not sit in this node's subtree.
    let mut cursor = Some(new_parent);
    while let Some(c) = cursor {
      if c == id {
        return Err(SeoError::Cycle(self.nodes[id.0].name.clone()));
      }
      cursor = self.nodes[c.0].parent;
    }
    self.check_reparent_conflicts(id, new_parent)?;

    if let Some(old) = self.nodes[id.0].parent {
      self.nodes[old.0].children.retain(|c| *c != id);
    }
    self.nodes[id.0].parent = Some(new_parent);
    self.nodes[new_parent.0].children.push(id);
    self.invalidate_views();
    Ok(())
  }

  pub(crate) fn append_children(
    &mut self,
    id: SeoNodeId,
    children: &[SeoNodeId],
  ) -> Result<(), SeoError> {
    for child in children {
      self.set_parent(*child, id)?;
    }
    Ok(())
  }

  /// Detach `id`; its children are reparented to `id`'s parent in order,
  /// preserving the subtree shape minus this node. The node stays in the
  /// arena but rejects further use.
  pub(crate) fn remove_self(&mut self, id: SeoNodeId) -> Result<(), SeoError> {
    self.live(id)?;
    let parent = self.nodes[id.0].parent;
    if let Some(p) = parent {
      self.nodes[p.0].children.retain(|c| *c != id);
    }
    let children = std::mem::take(&mut self.nodes[id.0].children);
    for child in &children {
      self.nodes[child.0].parent = parent;
    }
    if let Some(p) = parent {
      self.nodes[p.0].children.extend(children);
    }
    self.nodes[id.0].parent = None;
    self.nodes[id.0].detached = true;
    self.invalidate_views();
    Ok(())
  }

  // -- variable registration --

  pub(crate) fn register_setting_variables(
    &mut self,
    id: SeoNodeId,
    names: &[&str],
  ) -> Result<(), SeoError> {
    self.live(id)?;
    for raw in names {
      let name = raw.trim();
      if name.is_empty() {
        return Err(SeoError::EmptyName);
      }
      self.check_var_available(id, name, VarKind::Setting)?;
      self.nodes[id.0].setting_vars.insert(name.to_string());
    }
    self.invalidate_views();
    Ok(())
  }

  pub(crate) fn register_context_variable(
    &mut self,
    id: SeoNodeId,
    name: &str,
    f: SeoVarFn,
  ) -> Result<(), SeoError> {
    self.live(id)?;
    let name = name.trim();
    if name.is_empty() {
      return Err(SeoError::EmptyName);
    }
    if name.contains(':') {
      return Err(SeoError::InvalidVariableName(
        name.to_string(),
        "context variable names must not contain ':'",
      ));
    }
    self.check_var_available(id, name, VarKind::Context)?;
    self.nodes[id.0].context_vars.insert(name.to_string(), f);
    self.invalidate_views();
    Ok(())
  }

  pub(crate) fn register_og_property(
    &mut self,
    id: SeoNodeId,
    prop: &str,
    f: SeoVarFn,
  ) -> Result<(), SeoError> {
    self.live(id)?;
    let prop = prop.trim();
    if prop.is_empty() {
      return Err(SeoError::EmptyName);
    }
    if !prop.contains(':') {
      return Err(SeoError::InvalidVariableName(
        prop.to_string(),
        "Open Graph property names must contain ':'",
      ));
    }
    let node = &mut self.nodes[id.0];
    if node.og_props.contains_key(prop) {
      return Err(SeoError::DuplicateOgProperty(prop.to_string(), node.name.clone()));
    }
    node.og_props.insert(prop.to_string(), f);
    self.invalidate_views();
    Ok(())
  }

  /// A setting name must not collide with a context name on the path to
  /// the root or anywhere in this node's subtree, and vice versa.
  fn check_var_available(
    &self,
    id: SeoNodeId,
    name: &str,
    kind: VarKind,
  ) -> Result<(), SeoError> {
    let mut scope = self.chain_to_root(id);
    scope.extend(self.preorder(id).into_iter().skip(1));
    for other in scope {
      let node = &self.nodes[other.0];
      let (collides, found_kind) = match kind {
        VarKind::Setting => (node.context_vars.contains_key(name), "context"),
        VarKind::Context => (node.setting_vars.contains(name), "setting"),
      };
      if collides {
        return Err(SeoError::VariableConflict {
          name: name.to_string(),
          kind: found_kind,
          node: node.name.clone(),
        });
      }
    }
    Ok(())
  }

  /// Revalidate the disjointness invariant for a subtree about to move
  /// under `new_parent`, before any link changes.
  fn check_reparent_conflicts(
    &self,
    moving: SeoNodeId,
    new_parent: SeoNodeId,
  ) -> Result<(), SeoError> {
    let mut subtree_setting = BTreeSet::new();
    let mut subtree_context = BTreeSet::new();
    for id in self.preorder(moving) {
      let node = &self.nodes[id.0];
      subtree_setting.extend(node.setting_vars.iter().cloned());
      subtree_context.extend(node.context_vars.keys().cloned());
    }
    for ancestor in self.chain_to_root(new_parent) {
      let node = &self.nodes[ancestor.0];
      for name in node.context_vars.keys() {
        if subtree_setting.contains(name) {
          return Err(SeoError::VariableConflict {
            name: name.clone(),
            kind: "context",
            node: node.name.clone(),
          });
        }
      }
      for name in &node.setting_vars {
        if subtree_context.contains(name) {
          return Err(SeoError::VariableConflict {
            name: name.clone(),
            kind: "setting",
            node: node.name.clone(),
          });
        }
      }
    }
    Ok(())
  }

  // -- memoized inherited views --

  pub(crate) fn inherited(&self, id: SeoNodeId) -> &InheritedViews {
    self.nodes[id.0].inherited.get_or_init(|| self.compute_inherited(id))
  }

  fn compute_inherited(&self, id: SeoNodeId) -> InheritedViews {
    let mut context_fns = BTreeMap::new();
    let mut og_fns = BTreeMap::new();
    let mut available_names = BTreeSet::new();
    for ancestor in self.chain_to_root(id) {
      let node = &self.nodes[ancestor.0];
      for (name, f) in &node.context_vars {
        context_fns.entry(name.clone()).or_insert_with(|| f.clone());
      }
      for (prop, f) in &node.og_props {
        og_fns.entry(prop.clone()).or_insert_with(|| f.clone());
      }
      available_names.extend(node.setting_vars.iter().cloned());
      available_names.extend(node.context_vars.keys().cloned());
    }
    InheritedViews { context_fns, og_fns, available_names }
  }

  fn invalidate_views(&mut self) {
    for node in &mut self.nodes {
      node.inherited = OnceLock::new();
    }
  }
}
