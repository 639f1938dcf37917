//! Range-scoped, non-structural formatting metadata.
//!
//! Annotations (bold, links, ...) are attached to individual content
//! elements rather than to the tree, so they survive structural edits and
//! can span node boundaries freely. Two annotations are the same annotation
//! when both name and attributes are equal.

use serde::{
  Deserialize,
  Serialize,
};
use smallvec::SmallVec;

use crate::{
  Tendril,
  element::Attributes,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
  pub name:       Tendril,
  #[serde(default, skip_serializing_if = "Attributes::is_empty")]
  pub attributes: Attributes,
}

impl Annotation {
  pub fn new(name: impl Into<Tendril>) -> Self {
    Self {
      name:       name.into(),
      attributes: Attributes::new(),
    }
  }

  pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
    self.attributes.insert(key.into(), value);
    self
  }
}

/// The set of annotations on one content element.
///
/// Insertion order is preserved: it is the order annotations were applied,
/// and the order the view nests their renderings in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationSet(SmallVec<[Annotation; 1]>);

impl AnnotationSet {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with(annotation: Annotation) -> Self {
    let mut set = Self::new();
    set.insert(annotation);
    set
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn contains(&self, annotation: &Annotation) -> bool {
    self.0.contains(annotation)
  }

  /// Adds the annotation unless an equal one is already present.
  /// Returns whether the set changed.
  pub fn insert(&mut self, annotation: Annotation) -> bool {
    if self.contains(&annotation) {
      return false;
    }
    self.0.push(annotation);
    true
  }

  /// Removes an equal annotation. Returns whether the set changed.
  pub fn remove(&mut self, annotation: &Annotation) -> bool {
    let before = self.0.len();
    self.0.retain(|a| a != annotation);
    before != self.0.len()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
    self.0.iter()
  }
}

impl FromIterator<Annotation> for AnnotationSet {
  fn from_iter<I: IntoIterator<Item = Annotation>>(iter: I) -> Self {
    let mut set = Self::new();
    for annotation in iter {
      set.insert(annotation);
    }
    set
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn insert_is_idempotent() {
    let mut set = AnnotationSet::new();
    assert!(set.insert(Annotation::new("bold")));
    assert!(!set.insert(Annotation::new("bold")));
    assert_eq!(set.len(), 1);
  }

  #[test]
  fn same_name_different_attributes_are_distinct() {
    let plain = Annotation::new("link");
    let with_href = Annotation::new("link").with_attribute("href", "/Cat".into());

    let mut set = AnnotationSet::new();
    set.insert(plain.clone());
    assert!(set.insert(with_href.clone()));
    assert!(set.remove(&plain));
    assert!(set.contains(&with_href));
  }
}
