//! Document state: the linear store plus selection and history.
//!
//! [`Document`] owns the [`ElementSequence`] and exposes explicit state
//! transitions: [`commit`](Document::commit) validates a transaction
//! eagerly (length partition, removed data, attribute values, resulting
//! nesting) and applies it atomically - either the whole transaction lands
//! or the document is untouched. Every successful transition returns a
//! [`ChangeEvent`] that callers deliver to consumers in a fixed order:
//! the tree projection first, dependent views second. Selection is
//! remapped as part of the transition itself.

use std::ops::Range as Span;

use thiserror::Error;
use tracing::debug;

use crate::{
  element::DataElement,
  fragment::Fragment,
  history::{
    EditOrigin,
    History,
    HistoryError,
  },
  selection::Range,
  sequence::{
    ElementSequence,
    StructureViolation,
  },
  transaction::{
    Transaction,
    TransactionError,
  },
};

pub type Result<T> = std::result::Result<T, DocumentError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DocumentError {
  #[error("transaction error: {0}")]
  Transaction(#[from] TransactionError),
  #[error("history error: {0}")]
  History(#[from] HistoryError),
}

/// Describes one committed state transition: the dirty span in pre- and
/// post-state coordinates and the length delta. Everything strictly after
/// `old_range` kept its content and shifted by `delta`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
  pub old_range: Span<usize>,
  pub new_range: Span<usize>,
  pub delta:     isize,
  /// Document version after the transition.
  pub version:   u64,
}

#[derive(Debug)]
pub struct Document {
  sequence:  ElementSequence,
  selection: Range,
  history:   History,
  version:   u64,
}

impl Document {
  /// Creates a document over a sequence, which must be well-nested.
  pub fn new(sequence: ElementSequence) -> std::result::Result<Self, StructureViolation> {
    sequence.check_balance()?;
    Ok(Self {
      sequence,
      selection: Range::point(0),
      history: History::new(),
      version: 0,
    })
  }

  pub fn empty() -> Self {
    Self {
      sequence:  ElementSequence::new(),
      selection: Range::point(0),
      history:   History::new(),
      version:   0,
    }
  }

  pub fn sequence(&self) -> &ElementSequence {
    &self.sequence
  }

  pub fn len(&self) -> usize {
    self.sequence.len()
  }

  pub fn is_empty(&self) -> bool {
    self.sequence.is_empty()
  }

  /// The elements in `range`, clamped to the document bounds.
  pub fn data(&self, range: Span<usize>) -> &[DataElement] {
    self.sequence.data(range)
  }

  pub fn selection(&self) -> Range {
    self.selection
  }

  /// Moves the selection. This ends any running squash window: an edit
  /// after an explicit cursor move is a new undo step.
  pub fn set_selection(&mut self, selection: Range) {
    self.selection = selection;
    self.history.interrupt();
  }

  pub fn version(&self) -> u64 {
    self.version
  }

  pub fn history(&self) -> &History {
    &self.history
  }

  /// A range-bound editing handle; see [`Fragment`].
  pub fn fragment(&mut self, range: Range) -> Fragment<'_> {
    Fragment::new(self, range)
  }

  /// Commits a user-originated, non-continuable transaction.
  pub fn commit(&mut self, tx: &Transaction) -> Result<ChangeEvent> {
    self.commit_with(tx, EditOrigin::User, false)
  }

  /// Commits a transaction, recording origin and squash eligibility.
  ///
  /// Validation happens entirely before mutation: a failed commit leaves
  /// document, selection, and history exactly as they were.
  pub fn commit_with(
    &mut self,
    tx: &Transaction,
    origin: EditOrigin,
    continuable: bool,
  ) -> Result<ChangeEvent> {
    let next = tx.apply_checked(&self.sequence)?;

    let selection_before = self.selection;
    let selection_after = selection_before.map(tx);

    self
      .history
      .push(tx.clone(), selection_before, selection_after, origin, continuable);
    self.sequence = next;
    self.selection = selection_after;
    self.version += 1;

    let event = self.event_for(tx);
    debug!(
      version = self.version,
      delta = event.delta,
      "committed transaction"
    );
    Ok(event)
  }

  /// Reverts the most recent history entry. Fails with
  /// [`HistoryError::EmptyHistory`] (document untouched) past the boundary.
  pub fn undo(&mut self) -> Result<ChangeEvent> {
    let entry = self.history.undo()?.clone();

    let len_before = self.sequence.len();
    let mut sequence = self.sequence.clone();
    let mut head = usize::MAX;
    let mut tail = usize::MAX;

    for tx in entry.transactions.iter().rev() {
      let inverse = tx.invert();
      head = head.min(inverse.dirty_head());
      tail = tail.min(inverse.dirty_tail());
      sequence = inverse.apply_checked(&sequence)?;
    }

    self.sequence = sequence;
    self.selection = entry.selection_before;
    self.history.apply_undo();
    self.version += 1;

    debug!(version = self.version, "undid history entry");
    Ok(self.union_event(len_before, head, tail))
  }

  /// Replays the most recently undone entry. Fails with
  /// [`HistoryError::EmptyHistory`] (document untouched) if there is none.
  pub fn redo(&mut self) -> Result<ChangeEvent> {
    let entry = self.history.redo()?.clone();

    let len_before = self.sequence.len();
    let mut sequence = self.sequence.clone();
    let mut head = usize::MAX;
    let mut tail = usize::MAX;

    for tx in &entry.transactions {
      head = head.min(tx.dirty_head());
      tail = tail.min(tx.dirty_tail());
      sequence = tx.apply_checked(&sequence)?;
    }

    self.sequence = sequence;
    self.selection = entry.selection_after;
    self.history.apply_redo();
    self.version += 1;

    debug!(version = self.version, "redid history entry");
    Ok(self.union_event(len_before, head, tail))
  }

  fn event_for(&self, tx: &Transaction) -> ChangeEvent {
    let head = tx.dirty_head();
    let tail = tx
      .dirty_tail()
      .min(tx.len_before() - head)
      .min(tx.len_after() - head);

    ChangeEvent {
      old_range: head..tx.len_before() - tail,
      new_range: head..tx.len_after() - tail,
      delta:     tx.len_after() as isize - tx.len_before() as isize,
      version:   self.version,
    }
  }

  /// Event covering a whole entry: the union of each transaction's dirty
  /// span. Untouched-prefix and untouched-suffix lengths are comparable
  /// across the entry's intermediate states, so the minima bound the span.
  fn union_event(&self, len_before: usize, head: usize, tail: usize) -> ChangeEvent {
    let len_after = self.sequence.len();
    let head = head.min(len_before).min(len_after);
    let tail = tail
      .min(len_before - head)
      .min(len_after - head);

    ChangeEvent {
      old_range: head..len_before - tail,
      new_range: head..len_after - tail,
      delta:     len_after as isize - len_before as isize,
      version:   self.version,
    }
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

  fn document(text: &str) -> Document {
    Document::new(ElementSequence::from_elements(paragraph(text))).unwrap()
  }

  #[test]
  fn unbalanced_input_is_rejected_at_load() {
    let sequence = ElementSequence::from_elements(vec![DataElement::open("paragraph")]);
    assert!(Document::new(sequence).is_err());
  }

  #[test]
  fn commit_applies_atomically_and_reports_the_dirty_span() {
    let mut doc = document("abc");
    let tx = Transaction::replace(doc.sequence(), 1, 4, text_elements("xy")).unwrap();

    let event = doc.commit(&tx).unwrap();
    assert_eq!(event.old_range, 1..4);
    assert_eq!(event.new_range, 1..3);
    assert_eq!(event.delta, -1);
    assert_eq!(doc.sequence().text(0..doc.len()), "xy");
  }

  #[test]
  fn failed_commit_leaves_everything_untouched() {
    let mut doc = document("abc");
    let stale = Transaction::replace(&ElementSequence::new(), 0, 0, paragraph("z")).unwrap();

    let before = doc.sequence().clone();
    assert!(doc.commit(&stale).is_err());
    assert_eq!(doc.sequence(), &before);
    assert_eq!(doc.version(), 0);
    assert_eq!(doc.history().undo_depth(), 0);
  }

  #[test]
  fn commit_remaps_the_selection() {
    let mut doc = document("abc");
    doc.set_selection(Range::point(4));

    let tx = Transaction::replace(doc.sequence(), 1, 1, text_elements("__")).unwrap();
    doc.commit(&tx).unwrap();
    assert_eq!(doc.selection(), Range::point(6));
  }

  #[test]
  fn undo_twice_then_empty_history() {
    let mut doc = document("a");

    let tx1 = Transaction::replace(doc.sequence(), 2, 2, text_elements("b")).unwrap();
    doc.commit(&tx1).unwrap();
    let tx2 = Transaction::replace(doc.sequence(), 3, 3, text_elements("c")).unwrap();
    doc.commit(&tx2).unwrap();
    assert_eq!(doc.sequence().text(0..doc.len()), "abc");

    doc.undo().unwrap();
    assert_eq!(doc.sequence().text(0..doc.len()), "ab");
    doc.undo().unwrap();
    assert_eq!(doc.sequence().text(0..doc.len()), "a");

    let before = doc.sequence().clone();
    assert_eq!(
      doc.undo(),
      Err(DocumentError::History(HistoryError::EmptyHistory))
    );
    assert_eq!(doc.sequence(), &before);
  }

  #[test]
  fn redo_replays_and_new_commit_clears_it() {
    let mut doc = document("a");
    let tx = Transaction::replace(doc.sequence(), 2, 2, text_elements("b")).unwrap();
    doc.commit(&tx).unwrap();

    doc.undo().unwrap();
    assert_eq!(doc.sequence().text(0..doc.len()), "a");

    doc.redo().unwrap();
    assert_eq!(doc.sequence().text(0..doc.len()), "ab");

    doc.undo().unwrap();
    let tx2 = Transaction::replace(doc.sequence(), 2, 2, text_elements("z")).unwrap();
    doc.commit(&tx2).unwrap();
    assert_eq!(
      doc.redo(),
      Err(DocumentError::History(HistoryError::EmptyHistory))
    );
  }

  #[test]
  fn undo_restores_the_recorded_selection() {
    let mut doc = document("abc");
    doc.set_selection(Range::new(1, 4));

    let tx = Transaction::replace(doc.sequence(), 1, 4, text_elements("z")).unwrap();
    doc.commit(&tx).unwrap();
    assert_ne!(doc.selection(), Range::new(1, 4));

    doc.undo().unwrap();
    assert_eq!(doc.selection(), Range::new(1, 4));
  }

  #[test]
  fn squashed_entries_undo_as_one_step() {
    let mut doc = document("");

    for (offset, ch) in [(1, "a"), (2, "b"), (3, "c")] {
      let tx = Transaction::replace(doc.sequence(), offset, offset, text_elements(ch)).unwrap();
      doc.commit_with(&tx, EditOrigin::User, true).unwrap();
    }
    assert_eq!(doc.sequence().text(0..doc.len()), "abc");
    assert_eq!(doc.history().undo_depth(), 1);

    let event = doc.undo().unwrap();
    assert_eq!(doc.sequence().text(0..doc.len()), "");
    assert_eq!(event.delta, -3);
  }

  #[test]
  fn undo_event_covers_the_entry_span() {
    let mut doc = document("abcdef");

    let tx1 = Transaction::replace(doc.sequence(), 2, 3, text_elements("X")).unwrap();
    doc.commit_with(&tx1, EditOrigin::User, true).unwrap();
    let tx2 = Transaction::replace(doc.sequence(), 5, 6, text_elements("Y")).unwrap();
    doc.commit_with(&tx2, EditOrigin::User, true).unwrap();

    let event = doc.undo().unwrap();
    assert!(event.old_range.start <= 2);
    assert!(event.old_range.end >= 6);
    assert_eq!(event.delta, 0);
  }
}
