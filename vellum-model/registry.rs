//! Node type registry: structural and matching rules per node type.
//!
//! Each node type declares what it can contain, where it may appear, which
//! view tags it claims, and default attributes. Lookup never fails:
//! unregistered types fall back to the opaque *alien* type so a document
//! with unknown content still loads and projects.
//!
//! Registries are populated at startup and read-only afterwards. A
//! process-wide default seeded with the built-in types is available via
//! [`default_registry`]; instance registries exist for tests and embedders
//! that need isolation.

use std::{
  collections::HashMap,
  sync::Arc,
};

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::{
  debug,
  warn,
};

use crate::{
  Tendril,
  element::Attributes,
};

/// Type name used for unregistered content.
pub const ALIEN_TYPE: &str = "alien";

#[derive(Debug, Clone)]
pub struct NodeTypeSpec {
  pub name: Tendril,

  /// Content element: sits inside content-bearing branches, inline.
  pub is_content: bool,

  /// Branch whose children are content (text runs and inline nodes) rather
  /// than further structure.
  pub can_contain_content: bool,

  /// View tags this type claims when view content is linearized back into
  /// data elements.
  pub match_tags: Vec<Tendril>,

  /// Permitted parent types; `None` means any.
  pub parent_types: Option<Vec<Tendril>>,

  /// Permitted child types; `None` means any.
  pub child_types: Option<Vec<Tendril>>,

  /// Attributes assumed when an element omits them.
  pub default_attributes: Attributes,
}

impl NodeTypeSpec {
  /// A structural branch containing further structure.
  pub fn branch(name: impl Into<Tendril>) -> Self {
    Self {
      name:                name.into(),
      is_content:          false,
      can_contain_content: false,
      match_tags:          Vec::new(),
      parent_types:        None,
      child_types:         None,
      default_attributes:  Attributes::new(),
    }
  }

  /// A branch holding content: text runs and inline nodes.
  pub fn content_branch(name: impl Into<Tendril>) -> Self {
    Self {
      can_contain_content: true,
      ..Self::branch(name)
    }
  }

  /// An inline content node.
  pub fn inline(name: impl Into<Tendril>) -> Self {
    Self {
      is_content: true,
      ..Self::branch(name)
    }
  }

  pub fn with_match_tags<I, T>(mut self, tags: I) -> Self
  where
    I: IntoIterator<Item = T>,
    T: Into<Tendril>,
  {
    self.match_tags = tags.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_parent_types<I, T>(mut self, types: I) -> Self
  where
    I: IntoIterator<Item = T>,
    T: Into<Tendril>,
  {
    self.parent_types = Some(types.into_iter().map(Into::into).collect());
    self
  }

  pub fn with_child_types<I, T>(mut self, types: I) -> Self
  where
    I: IntoIterator<Item = T>,
    T: Into<Tendril>,
  {
    self.child_types = Some(types.into_iter().map(Into::into).collect());
    self
  }

  pub fn with_default_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
    self.default_attributes.insert(key.into(), value);
    self
  }

  pub fn allows_child(&self, child: &str) -> bool {
    match &self.child_types {
      Some(types) => types.iter().any(|t| t == child),
      None => true,
    }
  }

  pub fn allows_parent(&self, parent: &str) -> bool {
    match &self.parent_types {
      Some(types) => types.iter().any(|t| t == parent),
      None => true,
    }
  }
}

static ALIEN: Lazy<Arc<NodeTypeSpec>> = Lazy::new(|| Arc::new(NodeTypeSpec::branch(ALIEN_TYPE)));

#[derive(Debug, Clone, Default)]
pub struct NodeTypeRegistry {
  types:  HashMap<Tendril, Arc<NodeTypeSpec>>,
  by_tag: HashMap<Tendril, Tendril>,
}

impl NodeTypeRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// The built-in node types every document understands.
  pub fn builtin() -> Self {
    let mut registry = Self::new();
    registry.register(NodeTypeSpec::content_branch("paragraph").with_match_tags(["p"]));
    registry.register(
      NodeTypeSpec::content_branch("heading")
        .with_match_tags(["h1", "h2", "h3", "h4", "h5", "h6"])
        .with_default_attribute("level", serde_json::Value::from(1)),
    );
    registry.register(NodeTypeSpec::content_branch("preformatted").with_match_tags(["pre"]));
    registry.register(
      NodeTypeSpec::branch("list")
        .with_match_tags(["ul", "ol"])
        .with_child_types(["listItem"]),
    );
    registry.register(
      NodeTypeSpec::content_branch("listItem")
        .with_match_tags(["li"])
        .with_parent_types(["list"]),
    );
    registry.register(NodeTypeSpec::inline("inlineImage").with_match_tags(["img"]));
    registry
  }

  pub fn register(&mut self, spec: NodeTypeSpec) {
    for tag in &spec.match_tags {
      self.by_tag.insert(tag.clone(), spec.name.clone());
    }
    if self.types.insert(spec.name.clone(), Arc::new(spec)).is_some() {
      warn!("node type registered twice, keeping the later registration");
    }
  }

  pub fn is_registered(&self, name: &str) -> bool {
    self.types.contains_key(name)
  }

  pub fn lookup(&self, name: &str) -> Option<Arc<NodeTypeSpec>> {
    self.types.get(name).cloned()
  }

  /// Lookup that degrades to the alien type instead of failing.
  pub fn lookup_or_alien(&self, name: &str) -> Arc<NodeTypeSpec> {
    self.lookup(name).unwrap_or_else(|| {
      debug!(name, "unregistered node type, projecting as alien");
      Arc::clone(&ALIEN)
    })
  }

  /// Resolves a view tag to the node type claiming it.
  pub fn match_tag(&self, tag: &str) -> Option<Arc<NodeTypeSpec>> {
    self.by_tag.get(tag).and_then(|name| self.lookup(name))
  }
}

/// The process-wide registry: populated at startup, read-only afterwards.
pub fn default_registry() -> &'static RwLock<NodeTypeRegistry> {
  static REGISTRY: Lazy<RwLock<NodeTypeRegistry>> =
    Lazy::new(|| RwLock::new(NodeTypeRegistry::builtin()));
  &REGISTRY
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn lookup_degrades_to_alien() {
    let registry = NodeTypeRegistry::builtin();
    assert!(registry.lookup("madeUpThing").is_none());
    assert_eq!(registry.lookup_or_alien("madeUpThing").name, ALIEN_TYPE);
  }

  #[test]
  fn match_tags_resolve_to_their_type() {
    let registry = NodeTypeRegistry::builtin();
    assert_eq!(registry.match_tag("h3").unwrap().name, "heading");
    assert_eq!(registry.match_tag("li").unwrap().name, "listItem");
    assert!(registry.match_tag("marquee").is_none());
  }

  #[test]
  fn structural_rules_are_queryable() {
    let registry = NodeTypeRegistry::builtin();
    let list = registry.lookup("list").unwrap();
    assert!(list.allows_child("listItem"));
    assert!(!list.allows_child("paragraph"));

    let item = registry.lookup("listItem").unwrap();
    assert!(item.allows_parent("list"));
    assert!(!item.allows_parent("paragraph"));
    assert!(item.can_contain_content);
  }

  #[test]
  fn default_registry_is_seeded() {
    let registry = default_registry().read();
    assert!(registry.is_registered("paragraph"));
  }
}
