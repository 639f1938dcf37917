//! The canonical flat document store.
//!
//! An [`ElementSequence`] is the authoritative representation of a document:
//! an ordered list of [`DataElement`]s addressed by integer offset. The
//! well-nestedness invariant (every open tag has exactly one matching close
//! tag at a greater offset, and nesting parses as a tree) is checked by
//! [`ElementSequence::check_balance`]; transactions refuse to produce a
//! sequence that violates it.

use std::ops::Range;

use serde::{
  Deserialize,
  Serialize,
};
use thiserror::Error;

use crate::{
  Tendril,
  element::DataElement,
};

/// A violation of the well-nestedness invariant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StructureViolation {
  #[error("close tag {found:?} at offset {offset} does not match open tag {expected:?}")]
  MismatchedClose {
    offset:   usize,
    found:    Tendril,
    expected: Tendril,
  },
  #[error("close tag {found:?} at offset {offset} has no matching open tag")]
  UnopenedClose { offset: usize, found: Tendril },
  #[error("{depth} tags are still open at the end of the sequence")]
  UnclosedTags { depth: usize },
  #[error("replacement changes nesting depth by {delta}")]
  DepthChange { delta: isize },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementSequence {
  elements: Vec<DataElement>,
}

impl ElementSequence {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_elements(elements: Vec<DataElement>) -> Self {
    Self { elements }
  }

  pub fn len(&self) -> usize {
    self.elements.len()
  }

  pub fn is_empty(&self) -> bool {
    self.elements.is_empty()
  }

  pub fn get(&self, offset: usize) -> Option<&DataElement> {
    self.elements.get(offset)
  }

  pub fn elements(&self) -> &[DataElement] {
    &self.elements
  }

  pub fn into_elements(self) -> Vec<DataElement> {
    self.elements
  }

  /// The elements in `range`, clamped to the sequence bounds.
  pub fn data(&self, range: Range<usize>) -> &[DataElement] {
    let start = range.start.min(self.elements.len());
    let end = range.end.clamp(start, self.elements.len());
    &self.elements[start..end]
  }

  /// The text content of `range`, skipping structural elements.
  pub fn text(&self, range: Range<usize>) -> String {
    self
      .data(range)
      .iter()
      .filter_map(|element| {
        match element {
          DataElement::Text { ch, .. } => Some(*ch),
          _ => None,
        }
      })
      .collect()
  }

  /// Verifies well-nestedness over the whole sequence.
  pub fn check_balance(&self) -> Result<(), StructureViolation> {
    check_span_balance(&self.elements, 0)
  }
}

impl From<Vec<DataElement>> for ElementSequence {
  fn from(elements: Vec<DataElement>) -> Self {
    Self::from_elements(elements)
  }
}

/// Verifies that `elements` is balanced in isolation. `base` is only used to
/// report absolute offsets.
fn check_span_balance(
  elements: &[DataElement],
  base: usize,
) -> Result<(), StructureViolation> {
  let mut stack: Vec<&Tendril> = Vec::new();

  for (i, element) in elements.iter().enumerate() {
    match element {
      DataElement::Open { node_type, .. } => stack.push(node_type),
      DataElement::Close { node_type } => {
        match stack.pop() {
          Some(open) if open == node_type => {},
          Some(open) => {
            return Err(StructureViolation::MismatchedClose {
              offset:   base + i,
              found:    node_type.clone(),
              expected: open.clone(),
            });
          },
          None => {
            return Err(StructureViolation::UnopenedClose {
              offset: base + i,
              found:  node_type.clone(),
            });
          },
        }
      },
      DataElement::Text { .. } => {},
    }
  }

  if stack.is_empty() {
    Ok(())
  } else {
    Err(StructureViolation::UnclosedTags { depth: stack.len() })
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::element::text_elements;

  fn paragraph(text: &str) -> Vec<DataElement> {
    let mut elements = vec![DataElement::open("paragraph")];
    elements.extend(text_elements(text));
    elements.push(DataElement::close("paragraph"));
    elements
  }

  #[test]
  fn balanced_document_passes() {
    let seq = ElementSequence::from_elements(paragraph("abc"));
    assert_eq!(seq.check_balance(), Ok(()));
  }

  #[test]
  fn mismatched_close_is_reported_with_offset() {
    let seq = ElementSequence::from_elements(vec![
      DataElement::open("paragraph"),
      DataElement::close("heading"),
    ]);
    assert!(matches!(
      seq.check_balance(),
      Err(StructureViolation::MismatchedClose { offset: 1, .. })
    ));
  }

  #[test]
  fn unclosed_and_unopened_tags_are_reported() {
    let open_only = ElementSequence::from_elements(vec![DataElement::open("paragraph")]);
    assert_eq!(
      open_only.check_balance(),
      Err(StructureViolation::UnclosedTags { depth: 1 })
    );

    let close_only = ElementSequence::from_elements(vec![DataElement::close("paragraph")]);
    assert!(matches!(
      close_only.check_balance(),
      Err(StructureViolation::UnopenedClose { offset: 0, .. })
    ));
  }

  #[test]
  fn data_clamps_out_of_bounds_ranges() {
    let seq = ElementSequence::from_elements(paragraph("ab"));
    assert_eq!(seq.data(0..100).len(), 4);
    assert_eq!(seq.data(100..200).len(), 0);
  }

  #[test]
  fn text_skips_structure() {
    let seq = ElementSequence::from_elements(paragraph("hi"));
    assert_eq!(seq.text(0..seq.len()), "hi");
  }

  #[test]
  fn sequence_serde_round_trip() {
    let seq = ElementSequence::from_elements(paragraph("ab"));
    let json = serde_json::to_string(&seq).unwrap();
    let back: ElementSequence = serde_json::from_str(&json).unwrap();
    assert_eq!(seq, back);
  }
}
