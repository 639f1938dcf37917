//! View-layer node registry.
//!
//! Mirrors the model registry but answers the view-side questions: which
//! element tag renders a node type, which attributes are forwarded to the
//! view verbatim, and whether the rendered node may be split by editing.
//! Like its model counterpart it is populated at startup and read-only
//! afterwards, with an alien fallback instead of lookup failure.

use std::{
  collections::HashMap,
  sync::Arc,
};

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::warn;
use vellum_model::{
  Tendril,
  element::Attributes,
};

#[derive(Debug, Clone)]
pub struct ViewNodeSpec {
  /// Model node type this renders.
  pub name: Tendril,

  /// Element tag emitted for the node.
  pub tag: Tendril,

  /// Whether editing may split the rendered node in two.
  pub can_be_split: bool,

  /// Attribute keys copied from the open element onto the view element.
  pub forwarded_attributes: Vec<Tendril>,

  /// Overrides `tag` based on the element's attributes (a heading picks
  /// h1..h6 from its level, for example).
  pub tag_for: Option<fn(&Attributes) -> Tendril>,
}

impl ViewNodeSpec {
  pub fn new(name: impl Into<Tendril>, tag: impl Into<Tendril>) -> Self {
    Self {
      name:                 name.into(),
      tag:                  tag.into(),
      can_be_split:         true,
      forwarded_attributes: Vec::new(),
      tag_for:              None,
    }
  }

  pub fn with_can_be_split(mut self, can_be_split: bool) -> Self {
    self.can_be_split = can_be_split;
    self
  }

  pub fn with_forwarded_attributes<I, T>(mut self, keys: I) -> Self
  where
    I: IntoIterator<Item = T>,
    T: Into<Tendril>,
  {
    self.forwarded_attributes = keys.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_tag_for(mut self, tag_for: fn(&Attributes) -> Tendril) -> Self {
    self.tag_for = Some(tag_for);
    self
  }

  /// The tag to emit for an element with the given attributes.
  pub fn resolve_tag(&self, attributes: Option<&Attributes>) -> Tendril {
    match (self.tag_for, attributes) {
      (Some(tag_for), Some(attributes)) => tag_for(attributes),
      _ => self.tag.clone(),
    }
  }
}

fn heading_tag(attributes: &Attributes) -> Tendril {
  let level = attributes
    .get("level")
    .and_then(Value::as_u64)
    .unwrap_or(1)
    .clamp(1, 6);
  format!("h{level}").into()
}

static ALIEN: Lazy<Arc<ViewNodeSpec>> =
  Lazy::new(|| Arc::new(ViewNodeSpec::new("alien", "div").with_can_be_split(false)));

#[derive(Debug, Clone, Default)]
pub struct ViewNodeRegistry {
  types: HashMap<Tendril, Arc<ViewNodeSpec>>,
}

impl ViewNodeRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// View specs for the built-in node types.
  pub fn builtin() -> Self {
    let mut registry = Self::new();
    registry.register(ViewNodeSpec::new("paragraph", "p"));
    registry.register(
      ViewNodeSpec::new("heading", "h1")
        .with_tag_for(heading_tag)
        .with_forwarded_attributes(["level"]),
    );
    registry.register(ViewNodeSpec::new("preformatted", "pre"));
    registry.register(ViewNodeSpec::new("list", "ul"));
    registry.register(ViewNodeSpec::new("listItem", "li"));
    registry.register(
      ViewNodeSpec::new("inlineImage", "img")
        .with_can_be_split(false)
        .with_forwarded_attributes(["src", "alt"]),
    );
    registry
  }

  pub fn register(&mut self, spec: ViewNodeSpec) {
    if self.types.insert(spec.name.clone(), Arc::new(spec)).is_some() {
      warn!("view node type registered twice, keeping the later registration");
    }
  }

  pub fn lookup(&self, name: &str) -> Option<Arc<ViewNodeSpec>> {
    self.types.get(name).cloned()
  }

  pub fn lookup_or_alien(&self, name: &str) -> Arc<ViewNodeSpec> {
    self.lookup(name).unwrap_or_else(|| Arc::clone(&ALIEN))
  }
}

/// The process-wide view registry: populated at startup, read-only after.
pub fn default_view_registry() -> &'static RwLock<ViewNodeRegistry> {
  static REGISTRY: Lazy<RwLock<ViewNodeRegistry>> =
    Lazy::new(|| RwLock::new(ViewNodeRegistry::builtin()));
  &REGISTRY
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn heading_tag_tracks_the_level_attribute() {
    let registry = ViewNodeRegistry::builtin();
    let heading = registry.lookup("heading").unwrap();

    let mut attributes = Attributes::new();
    attributes.insert("level".into(), Value::from(3));
    assert_eq!(heading.resolve_tag(Some(&attributes)), "h3");

    attributes.insert("level".into(), Value::from(99));
    assert_eq!(heading.resolve_tag(Some(&attributes)), "h6");

    assert_eq!(heading.resolve_tag(None), "h1");
  }

  #[test]
  fn unknown_types_fall_back_to_the_alien_spec() {
    let registry = ViewNodeRegistry::builtin();
    let spec = registry.lookup_or_alien("holograph");
    assert_eq!(spec.name, "alien");
    assert!(!spec.can_be_split);
  }
}
