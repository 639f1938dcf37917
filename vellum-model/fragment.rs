//! Range-bound editing handles.
//!
//! A [`Fragment`] pairs a document with a live range and exposes the small
//! surface widgets edit through: replace the covered content, annotate it,
//! collapse the range, select it. Every operation is sugar over a
//! transaction commit, so all validation and history behavior is exactly
//! that of [`Document::commit`]; the fragment's range is kept meaningful
//! across its own edits.

use crate::{
  annotation::Annotation,
  document::{
    ChangeEvent,
    Document,
    Result,
  },
  element::DataElement,
  selection::Range,
  transaction::Transaction,
};

#[derive(Debug)]
pub struct Fragment<'a> {
  document: &'a mut Document,
  range:    Range,
}

impl<'a> Fragment<'a> {
  pub(crate) fn new(document: &'a mut Document, range: Range) -> Self {
    let len = document.len();
    let range = Range::new(range.anchor.min(len), range.head.min(len));
    Self { document, range }
  }

  pub fn range(&self) -> Range {
    self.range
  }

  pub fn data(&self) -> &[DataElement] {
    self.document.data(self.range.from()..self.range.to())
  }

  /// Replaces the covered range with `content`. Afterwards the fragment
  /// covers exactly the inserted content.
  pub fn insert_content(&mut self, content: Vec<DataElement>) -> Result<ChangeEvent> {
    let from = self.range.from();
    let inserted = content.len();
    let tx = Transaction::replace(self.document.sequence(), from, self.range.to(), content)?;
    let event = self.document.commit(&tx)?;
    self.range = Range::new(from, from + inserted);
    Ok(event)
  }

  /// Removes the covered content, leaving a collapsed fragment.
  pub fn remove(&mut self) -> Result<ChangeEvent> {
    self.insert_content(Vec::new())
  }

  /// Applies or clears an annotation over the covered content. The range
  /// is unaffected (annotating preserves length).
  pub fn annotate(&mut self, annotation: &Annotation, set: bool) -> Result<ChangeEvent> {
    let tx = Transaction::annotate(
      self.document.sequence(),
      self.range.from(),
      self.range.to(),
      annotation,
      set,
    )?;
    self.document.commit(&tx)
  }

  pub fn collapse_to_end(&mut self) -> &mut Self {
    self.range = self.range.collapse_to_end();
    self
  }

  pub fn collapse_to_start(&mut self) -> &mut Self {
    self.range = self.range.collapse_to_start();
    self
  }

  /// Makes the fragment's range the document selection.
  pub fn select(&mut self) -> &mut Self {
    self.document.set_selection(self.range);
    self
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::{
    element::text_elements,
    sequence::ElementSequence,
  };

  fn document(text: &str) -> Document {
    let mut elements = vec![DataElement::open("paragraph")];
    elements.extend(text_elements(text));
    elements.push(DataElement::close("paragraph"));
    Document::new(ElementSequence::from_elements(elements)).unwrap()
  }

  #[test]
  fn insert_content_replaces_and_recovers_the_range() {
    let mut doc = document("abc");
    let mut fragment = doc.fragment(Range::new(1, 4));

    fragment.insert_content(text_elements("xy")).unwrap();
    assert_eq!(fragment.range(), Range::new(1, 3));
    assert_eq!(fragment.document.sequence().text(0..5), "xy");
  }

  #[test]
  fn insert_collapse_select_chain() {
    let mut doc = document("ab");
    let mut fragment = doc.fragment(Range::new(1, 3));

    fragment.insert_content(text_elements("Z")).unwrap();
    fragment.collapse_to_end().select();
    assert_eq!(doc.selection(), Range::point(2));
  }

  #[test]
  fn remove_collapses_the_fragment() {
    let mut doc = document("abc");
    let mut fragment = doc.fragment(Range::new(1, 4));
    fragment.remove().unwrap();

    assert_eq!(fragment.range(), Range::point(1));
    assert_eq!(doc.len(), 2);
  }

  #[test]
  fn annotate_covers_exactly_the_fragment() {
    let bold = Annotation::new("bold");
    let mut doc = document("abc");
    let mut fragment = doc.fragment(Range::new(2, 3));
    fragment.annotate(&bold, true).unwrap();

    let annotated: Vec<bool> = doc
      .data(0..doc.len())
      .iter()
      .map(|element| {
        match element {
          DataElement::Text { annotations, .. } => annotations.contains(&bold),
          _ => false,
        }
      })
      .collect();
    assert_eq!(annotated, vec![false, false, true, false, false]);
  }

  #[test]
  fn out_of_bounds_ranges_are_clamped() {
    let mut doc = document("a");
    let fragment = doc.fragment(Range::new(0, 100));
    assert_eq!(fragment.range().to(), 3);
  }
}
