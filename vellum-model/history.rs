//! Linear undo/redo history of committed transactions.
//!
//! The history is a pair of stacks. Committing pushes onto the undo stack
//! and clears the redo stack; undoing moves the top entry across to the
//! redo stack (and vice versa). History state only changes through
//! [`History::apply_undo`]/[`History::apply_redo`], which callers invoke
//! after successfully applying the entry's transactions - peeking and
//! applying are separate so a failed application can never desynchronize
//! the log from the document.
//!
//! An entry can hold several transactions: a commit flagged *continuable*
//! whose origin matches a continuable top entry is squashed into it rather
//! than pushed, which is how bursts of typing become a single undo step.
//! The time window for that is the caller's policy (typically a debounce
//! hook), not the history's.

use thiserror::Error;

use crate::{
  selection::Range,
  transaction::Transaction,
};

pub type Result<T> = std::result::Result<T, HistoryError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HistoryError {
  #[error("no further history in that direction")]
  EmptyHistory,
}

/// Who authored an edit. Collaborative replay uses this to tell local
/// edits from remote ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EditOrigin {
  #[default]
  User,
  Remote,
  Programmatic,
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
  /// The committed transactions, in application order.
  pub transactions:     Vec<Transaction>,
  pub selection_before: Range,
  pub selection_after:  Range,
  pub origin:           EditOrigin,
  continuable:          bool,
}

impl HistoryEntry {
  pub fn is_continuable(&self) -> bool {
    self.continuable
  }
}

#[derive(Debug, Default)]
pub struct History {
  undo_stack: Vec<HistoryEntry>,
  redo_stack: Vec<HistoryEntry>,
}

impl History {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn undo_depth(&self) -> usize {
    self.undo_stack.len()
  }

  pub fn redo_depth(&self) -> usize {
    self.redo_stack.len()
  }

  pub fn is_empty(&self) -> bool {
    self.undo_stack.is_empty() && self.redo_stack.is_empty()
  }

  /// Records a commit. Any redoable future is invalidated. A continuable
  /// commit squashes into a continuable top entry of the same origin.
  pub fn push(
    &mut self,
    transaction: Transaction,
    selection_before: Range,
    selection_after: Range,
    origin: EditOrigin,
    continuable: bool,
  ) {
    self.redo_stack.clear();

    if continuable
      && let Some(top) = self.undo_stack.last_mut()
      && top.continuable
      && top.origin == origin
    {
      top.transactions.push(transaction);
      top.selection_after = selection_after;
      return;
    }

    self.undo_stack.push(HistoryEntry {
      transactions: vec![transaction],
      selection_before,
      selection_after,
      origin,
      continuable,
    });
  }

  /// Ends the current squash run: the next continuable commit starts a
  /// fresh entry. Called when the selection moves.
  pub fn interrupt(&mut self) {
    if let Some(top) = self.undo_stack.last_mut() {
      top.continuable = false;
    }
  }

  /// The entry an undo would revert. Does not change history state.
  pub fn undo(&self) -> Result<&HistoryEntry> {
    self.undo_stack.last().ok_or(HistoryError::EmptyHistory)
  }

  /// The entry a redo would replay. Does not change history state.
  pub fn redo(&self) -> Result<&HistoryEntry> {
    self.redo_stack.last().ok_or(HistoryError::EmptyHistory)
  }

  /// Moves the top undo entry to the redo stack. Call only after the
  /// entry's inverse transactions applied successfully.
  pub fn apply_undo(&mut self) {
    if let Some(entry) = self.undo_stack.pop() {
      self.redo_stack.push(entry);
    }
  }

  /// Moves the top redo entry back to the undo stack. Call only after the
  /// entry's transactions applied successfully.
  pub fn apply_redo(&mut self) {
    if let Some(entry) = self.redo_stack.pop() {
      self.undo_stack.push(entry);
    }
  }
}
