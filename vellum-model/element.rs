//! Typed elements of the linear document model.
//!
//! A document is not stored as a tree but as a flat sequence of
//! [`DataElement`]s: an [`Open`] tag carrying attributes, a matching
//! [`Close`] tag, or a single character of content with its annotations.
//! Structure is encoded entirely by tag nesting, which makes edits
//! expressible as splices over one linear address space.
//!
//! Elements serialize with serde and round-trip losslessly; the serialized
//! element array is the document's interchange form.
//!
//! [`Open`]: DataElement::Open
//! [`Close`]: DataElement::Close

use std::collections::BTreeMap;

use serde::{
  Deserialize,
  Serialize,
};
use serde_json::Value;

use crate::{
  Tendril,
  annotation::AnnotationSet,
};

/// Attribute map attached to an open tag. Ordered so serialization is
/// deterministic.
pub type Attributes = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataElement {
  /// Opens a structural node of the given type.
  Open {
    node_type:  Tendril,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    attributes: Attributes,
  },

  /// Closes the nearest unclosed [`DataElement::Open`] of the same type.
  Close { node_type: Tendril },

  /// One character of content. Annotations apply to exactly this position.
  Text {
    ch:          char,
    #[serde(default, skip_serializing_if = "AnnotationSet::is_empty")]
    annotations: AnnotationSet,
  },
}

impl DataElement {
  pub fn open(node_type: impl Into<Tendril>) -> Self {
    DataElement::Open {
      node_type:  node_type.into(),
      attributes: Attributes::new(),
    }
  }

  pub fn open_with(node_type: impl Into<Tendril>, attributes: Attributes) -> Self {
    DataElement::Open {
      node_type: node_type.into(),
      attributes,
    }
  }

  pub fn close(node_type: impl Into<Tendril>) -> Self {
    DataElement::Close {
      node_type: node_type.into(),
    }
  }

  pub fn text(ch: char) -> Self {
    DataElement::Text {
      ch,
      annotations: AnnotationSet::new(),
    }
  }

  pub fn annotated(ch: char, annotations: AnnotationSet) -> Self {
    DataElement::Text { ch, annotations }
  }

  /// Whether this element opens or closes structure (as opposed to content).
  pub fn is_structural(&self) -> bool {
    matches!(self, DataElement::Open { .. } | DataElement::Close { .. })
  }

  pub fn is_content(&self) -> bool {
    matches!(self, DataElement::Text { .. })
  }

  /// The node type of a structural element, `None` for content.
  pub fn node_type(&self) -> Option<&str> {
    match self {
      DataElement::Open { node_type, .. } | DataElement::Close { node_type } => {
        Some(node_type.as_str())
      },
      DataElement::Text { .. } => None,
    }
  }

  /// Nesting depth contribution: +1 for open, -1 for close, 0 for content.
  pub fn nesting(&self) -> isize {
    match self {
      DataElement::Open { .. } => 1,
      DataElement::Close { .. } => -1,
      DataElement::Text { .. } => 0,
    }
  }

  /// Whether this element is the close tag matching `open`.
  pub fn closes(&self, open: &DataElement) -> bool {
    match (self, open) {
      (DataElement::Close { node_type: close }, DataElement::Open { node_type: open, .. }) => {
        close == open
      },
      _ => false,
    }
  }

  pub fn attribute(&self, key: &str) -> Option<&Value> {
    match self {
      DataElement::Open { attributes, .. } => attributes.get(key),
      _ => None,
    }
  }
}

/// Convenience: one unannotated [`DataElement::Text`] per character.
pub fn text_elements(text: &str) -> Vec<DataElement> {
  text.chars().map(DataElement::text).collect()
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn close_matches_open_of_same_type() {
    let open = DataElement::open("paragraph");
    assert!(DataElement::close("paragraph").closes(&open));
    assert!(!DataElement::close("heading").closes(&open));
    assert!(!DataElement::text('a').closes(&open));
  }

  #[test]
  fn serde_round_trip() {
    let mut attributes = Attributes::new();
    attributes.insert("level".into(), Value::from(2));
    let elements = vec![
      DataElement::open_with("heading", attributes),
      DataElement::text('h'),
      DataElement::text('i'),
      DataElement::close("heading"),
    ];

    let json = serde_json::to_string(&elements).unwrap();
    let back: Vec<DataElement> = serde_json::from_str(&json).unwrap();
    assert_eq!(elements, back);
  }

  #[test]
  fn text_elements_splits_per_character() {
    let elements = text_elements("ab");
    assert_eq!(elements, vec![DataElement::text('a'), DataElement::text('b')]);
  }
}
