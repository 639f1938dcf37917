//! Cursor and selection ranges over linear-model offsets.
//!
//! A [`Range`] has an `anchor` and a `head`: the head is where the cursor
//! sits, the anchor is the other end of the selection. When the two are
//! equal the range is a collapsed cursor. `from()`/`to()` give the bounds
//! regardless of direction.
//!
//! Ranges are remapped through every committed transaction so selections
//! survive structural edits; see [`Range::map`].

use serde::{
  Deserialize,
  Serialize,
};

use crate::transaction::{
  Bias,
  Transaction,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
  pub anchor: usize,
  pub head:   usize,
}

impl Range {
  pub const fn new(anchor: usize, head: usize) -> Self {
    Self { anchor, head }
  }

  /// A collapsed cursor.
  pub const fn point(offset: usize) -> Self {
    Self::new(offset, offset)
  }

  /// The smaller bound.
  pub fn from(&self) -> usize {
    self.anchor.min(self.head)
  }

  /// The larger bound.
  pub fn to(&self) -> usize {
    self.anchor.max(self.head)
  }

  pub fn len(&self) -> usize {
    self.to() - self.from()
  }

  pub fn is_collapsed(&self) -> bool {
    self.anchor == self.head
  }

  pub fn contains(&self, offset: usize) -> bool {
    self.from() <= offset && offset < self.to()
  }

  pub fn overlaps(&self, other: &Range) -> bool {
    self.from() < other.to() && other.from() < self.to()
  }

  pub fn collapse_to_start(self) -> Self {
    Self::point(self.from())
  }

  pub fn collapse_to_end(self) -> Self {
    Self::point(self.to())
  }

  /// Remaps both endpoints through a transaction with the default typing
  /// bias, so a cursor at an insertion point trails the inserted content.
  #[must_use]
  pub fn map(self, tx: &Transaction) -> Self {
    self.map_with(tx, Bias::After)
  }

  #[must_use]
  pub fn map_with(self, tx: &Transaction, bias: Bias) -> Self {
    Self {
      anchor: tx.map_offset(self.anchor, bias),
      head:   tx.map_offset(self.head, bias),
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::{
    element::text_elements,
    sequence::ElementSequence,
    transaction::Transaction,
  };

  fn doc(text: &str) -> ElementSequence {
    let mut elements = vec![crate::element::DataElement::open("paragraph")];
    elements.extend(text_elements(text));
    elements.push(crate::element::DataElement::close("paragraph"));
    ElementSequence::from_elements(elements)
  }

  #[test]
  fn bounds_ignore_direction() {
    let forward = Range::new(2, 7);
    let backward = Range::new(7, 2);
    assert_eq!(forward.from(), backward.from());
    assert_eq!(forward.to(), backward.to());
    assert_eq!(forward.len(), 5);
  }

  #[test]
  fn cursor_trails_typed_text() {
    let sequence = doc("ab");
    // Type "xy" at the cursor position 2.
    let tx = Transaction::replace(&sequence, 2, 2, text_elements("xy")).unwrap();

    let cursor = Range::point(2).map(&tx);
    assert_eq!(cursor, Range::point(4));

    let sticky = Range::point(2).map_with(&tx, Bias::Before);
    assert_eq!(sticky, Range::point(2));
  }

  #[test]
  fn selection_inside_removed_span_collapses() {
    let sequence = doc("abcdef");
    let tx = Transaction::replace(&sequence, 2, 6, vec![]).unwrap();

    let selection = Range::new(3, 5).map(&tx);
    assert!(selection.is_collapsed());
    assert_eq!(selection.head, 2);
  }
}
