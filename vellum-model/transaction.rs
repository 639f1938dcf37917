//! Invertible edit operations over the linear model.
//!
//! A [`Transaction`] is an ordered list of [`Operation`]s applied from the
//! start of the document:
//!
//! - **Retain(n)** - keep the next `n` elements unchanged
//! - **Insert(elements)** - insert elements at the current position
//! - **Remove(elements)** - remove the next elements; the removed data is
//!   captured in the operation itself
//! - **Attributes** - change one attribute of the open tag at the current
//!   position (zero-length)
//!
//! The retained and removed lengths must exactly partition the document the
//! transaction was built against; applying to a document of any other
//! length fails with [`TransactionError::LengthMismatch`] before anything
//! is mutated. Because removals carry their data, [`Transaction::invert`]
//! is total: it swaps insert/remove roles and flips attribute values
//! without needing the source document.
//!
//! # Building
//!
//! Transactions are built either from explicit change lists
//! ([`Transaction::change`], [`Transaction::replace`]) or by diffing a
//! replacement against the existing content
//! ([`Transaction::from_replacement`]), which trims the longest common
//! prefix and suffix so only the differing middle lands in the operation
//! list. The second form is what view-originated edits use: it keeps
//! history entries minimal and avoids rebuilding untouched nodes.
//!
//! # Position mapping
//!
//! [`Transaction::map_offset`] remaps a pre-state offset into the
//! post-state. [`Bias`] controls behavior at insertion boundaries: `After`
//! (the default for typing) lands after the inserted content, `Before`
//! stays put. An offset inside a removed span collapses to the start of
//! the removal.

use serde_json::Value;
use smallvec::SmallVec;
use thiserror::Error;
use tracing::debug;

use crate::{
  Tendril,
  annotation::Annotation,
  element::DataElement,
  sequence::{
    ElementSequence,
    StructureViolation,
  },
};

pub type Result<T> = std::result::Result<T, TransactionError>;

/// (from, to, replacement) triple in pre-state offsets.
pub type Change = (usize, usize, Vec<DataElement>);

#[derive(Debug, Clone, Error, PartialEq)]
#[non_exhaustive]
pub enum TransactionError {
  #[error("transaction length mismatch: expected document length {expected}, got {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("invalid change range: start {from} is after end {to}")]
  InvalidRange { from: usize, to: usize },
  #[error("change range {from}..{to} is out of bounds for document length {len}")]
  RangeOutOfBounds {
    from: usize,
    to:   usize,
    len:  usize,
  },
  #[error("change range {from}..{to} overlaps previous end {prev_end}")]
  OverlappingRange {
    prev_end: usize,
    from:     usize,
    to:       usize,
  },
  #[error("transaction would produce unbalanced structure: {0}")]
  IllegalStructure(#[from] StructureViolation),
  #[error("attribute operation at offset {offset} does not target an open tag")]
  AttributeTarget { offset: usize },
  #[error("attribute {key:?} at offset {offset} does not match the recorded value")]
  AttributeMismatch { offset: usize, key: String },
  #[error("removed data at offset {offset} does not match the document")]
  RemoveMismatch { offset: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
  /// Leave the next `n` elements untouched.
  Retain(usize),

  /// Insert elements at the current position.
  Insert(Vec<DataElement>),

  /// Remove the next elements. The expected data is captured so the
  /// operation can be verified on apply and inverted without the source
  /// document.
  Remove(Vec<DataElement>),

  /// Change one attribute of the open tag at the current position. Both the
  /// old and new value are captured; `None` means absent. Zero-length: the
  /// element itself is carried by a surrounding retain.
  Attributes {
    key:  Tendril,
    from: Option<Value>,
    to:   Option<Value>,
  },
}

/// Which side an offset associates with when content is inserted at it.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Bias {
  /// Stay before insertions at this position (stick-to-start).
  Before,

  /// Move after insertions at this position, so typed text trails the
  /// cursor. The default.
  #[default]
  After,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transaction {
  operations: Vec<Operation>,
  /// The required document length. Applying refuses any other length.
  len_before: usize,
  len_after:  usize,
}

impl Transaction {
  pub fn operations(&self) -> &[Operation] {
    &self.operations
  }

  /// The document length this transaction partitions.
  pub fn len_before(&self) -> usize {
    self.len_before
  }

  pub fn len_after(&self) -> usize {
    self.len_after
  }

  /// Whether applying changes nothing.
  pub fn is_identity(&self) -> bool {
    self.operations.is_empty() || self.operations == [Operation::Retain(self.len_before)]
  }

  /// Length of the untouched prefix (leading retain).
  pub fn dirty_head(&self) -> usize {
    match self.operations.first() {
      Some(Operation::Retain(n)) => *n,
      Some(_) => 0,
      None => self.len_before,
    }
  }

  /// Length of the untouched suffix (trailing retain).
  pub fn dirty_tail(&self) -> usize {
    match self.operations.last() {
      Some(Operation::Retain(n)) => *n,
      Some(_) => 0,
      None => 0,
    }
  }

  // Builder operations: retain/insert/remove/set_attribute. These are only
  // meaningful while constructing a transaction; a transaction handed to
  // `apply` is treated as immutable.

  pub fn retain(&mut self, n: usize) {
    use Operation::*;

    if n == 0 {
      return;
    }

    self.len_before += n;
    self.len_after += n;

    if let Some(Retain(count)) = self.operations.last_mut() {
      *count += n;
    } else {
      self.operations.push(Retain(n));
    }
  }

  pub fn remove(&mut self, elements: Vec<DataElement>) {
    use Operation::*;

    if elements.is_empty() {
      return;
    }

    self.len_before += elements.len();

    if let Some(Remove(prev)) = self.operations.last_mut() {
      prev.extend(elements);
    } else {
      self.operations.push(Remove(elements));
    }
  }

  pub fn insert(&mut self, elements: Vec<DataElement>) {
    use Operation::*;

    if elements.is_empty() {
      return;
    }

    self.len_after += elements.len();

    // Canonical order for a replacement is Insert followed by Remove, so an
    // insert slots in before a trailing remove and merges with an insert
    // already there.
    let new_last = match self.operations.as_mut_slice() {
      [.., Insert(prev)] | [.., Insert(prev), Remove(_)] => {
        prev.extend(elements);
        return;
      },
      [.., last @ Remove(_)] => std::mem::replace(last, Insert(elements)),
      _ => Insert(elements),
    };

    self.operations.push(new_last);
  }

  pub fn set_attribute(&mut self, key: impl Into<Tendril>, from: Option<Value>, to: Option<Value>) {
    self.operations.push(Operation::Attributes {
      key: key.into(),
      from,
      to,
    });
  }

  fn ensure_len(&self, len: usize) -> Result<()> {
    if len != self.len_before {
      return Err(TransactionError::LengthMismatch {
        expected: self.len_before,
        actual:   len,
      });
    }
    Ok(())
  }

  /// Applies this transaction, producing the post-state sequence. The input
  /// is never mutated, so a failed apply leaves no trace.
  pub fn apply(&self, seq: &ElementSequence) -> Result<ElementSequence> {
    self.ensure_len(seq.len())?;
    let old = seq.elements();

    // First pass: validate attribute targets and collect patches keyed by
    // pre-state offset, before any element is copied.
    let mut patches: SmallVec<[(usize, &Tendril, &Option<Value>); 2]> = SmallVec::new();
    let mut pos = 0;
    for op in &self.operations {
      match op {
        Operation::Retain(n) => pos += n,
        Operation::Remove(elements) => pos += elements.len(),
        Operation::Insert(_) => {},
        Operation::Attributes { key, from, to } => {
          let Some(DataElement::Open { attributes, .. }) = old.get(pos) else {
            return Err(TransactionError::AttributeTarget { offset: pos });
          };
          if attributes.get(key.as_str()) != from.as_ref() {
            return Err(TransactionError::AttributeMismatch {
              offset: pos,
              key:    key.to_string(),
            });
          }
          patches.push((pos, key, to));
        },
      }
    }

    let mut out: Vec<DataElement> = Vec::with_capacity(self.len_after);
    let mut patches = patches.into_iter().peekable();
    let mut pos = 0;

    for op in &self.operations {
      match op {
        Operation::Retain(n) => {
          for offset in pos..pos + n {
            let mut element = old[offset].clone();
            while matches!(patches.peek(), Some((p, ..)) if *p == offset) {
              let (_, key, to) = patches.next().expect("peeked");
              if let DataElement::Open { attributes, .. } = &mut element {
                match to {
                  Some(value) => {
                    attributes.insert(key.to_string(), value.clone());
                  },
                  None => {
                    attributes.remove(key.as_str());
                  },
                }
              }
            }
            out.push(element);
          }
          pos += n;
        },
        Operation::Insert(elements) => out.extend_from_slice(elements),
        Operation::Remove(elements) => {
          if old[pos..pos + elements.len()] != elements[..] {
            return Err(TransactionError::RemoveMismatch { offset: pos });
          }
          pos += elements.len();
        },
        Operation::Attributes { .. } => {},
      }
    }

    // An attribute patch not consumed by a retain targets a removed element.
    if let Some((offset, ..)) = patches.next() {
      return Err(TransactionError::AttributeTarget { offset });
    }

    debug_assert_eq!(pos, old.len(), "operations partition the document");
    debug_assert_eq!(out.len(), self.len_after);

    Ok(ElementSequence::from(out))
  }

  /// [`apply`](Self::apply) plus a well-nestedness scan of the result. This
  /// is the commit-path entry point: nothing is mutated on failure.
  pub fn apply_checked(&self, seq: &ElementSequence) -> Result<ElementSequence> {
    let out = self.apply(seq)?;
    out.check_balance()?;
    Ok(out)
  }

  /// The transaction that reverts this one. Insert and remove swap roles
  /// (their data is captured), retains are preserved, attribute values
  /// flip. An inverse is itself a valid transaction.
  #[must_use]
  pub fn invert(&self) -> Self {
    let operations = self
      .operations
      .iter()
      .map(|op| {
        match op {
          Operation::Retain(n) => Operation::Retain(*n),
          Operation::Insert(elements) => Operation::Remove(elements.clone()),
          Operation::Remove(elements) => Operation::Insert(elements.clone()),
          Operation::Attributes { key, from, to } => {
            Operation::Attributes {
              key:  key.clone(),
              from: to.clone(),
              to:   from.clone(),
            }
          },
        }
      })
      .collect();

    Self {
      operations,
      len_before: self.len_after,
      len_after: self.len_before,
    }
  }

  /// Maps a pre-state offset into the post-state document.
  ///
  /// Total: any input (clamped to the pre-state length) yields an offset
  /// within `[0, len_after]`. An offset inside a removed span collapses to
  /// the start of the removal; an offset exactly at a replacement start
  /// stays at that start; an offset at a pure insertion moves past the
  /// inserted content under [`Bias::After`] and stays under
  /// [`Bias::Before`].
  pub fn map_offset(&self, pos: usize, bias: Bias) -> usize {
    let pos = pos.min(self.len_before);
    let mut old_pos = 0;
    let mut new_pos = 0;
    let mut ops = self.operations.iter().peekable();

    while let Some(op) = ops.next() {
      match op {
        Operation::Retain(n) => {
          if pos < old_pos + n {
            return new_pos + (pos - old_pos);
          }
          old_pos += n;
          new_pos += n;
        },
        Operation::Insert(inserted) => {
          let ins = inserted.len();

          // An insert directly followed by a remove is a replacement and is
          // mapped as a unit.
          if let Some(Operation::Remove(removed)) = ops.peek() {
            let rem = removed.len();
            if pos < old_pos + rem {
              return if pos == old_pos || bias == Bias::Before {
                new_pos
              } else {
                new_pos + ins
              };
            }
            ops.next();
            old_pos += rem;
            new_pos += ins;
            continue;
          }

          if pos == old_pos && bias == Bias::Before {
            return new_pos;
          }
          new_pos += ins;
        },
        Operation::Remove(removed) => {
          if pos < old_pos + removed.len() {
            return new_pos;
          }
          old_pos += removed.len();
        },
        Operation::Attributes { .. } => {},
      }
    }

    new_pos
  }

  /// Builds a transaction from a sorted set of non-overlapping changes.
  /// Removed data is captured from `seq`. Refuses changes that are out of
  /// bounds, overlapping, or that change the total nesting depth.
  pub fn change<I>(seq: &ElementSequence, changes: I) -> Result<Self>
  where
    I: IntoIterator<Item = Change>,
  {
    let len = seq.len();
    let mut tx = Self::default();
    let mut last = 0;
    let mut depth_delta = 0isize;

    for (from, to, content) in changes {
      if from > to {
        return Err(TransactionError::InvalidRange { from, to });
      }
      if to > len {
        return Err(TransactionError::RangeOutOfBounds { from, to, len });
      }
      if from < last {
        return Err(TransactionError::OverlappingRange {
          prev_end: last,
          from,
          to,
        });
      }

      tx.retain(from - last);

      let removed = seq.data(from..to).to_vec();
      depth_delta += content.iter().map(DataElement::nesting).sum::<isize>();
      depth_delta -= removed.iter().map(DataElement::nesting).sum::<isize>();

      tx.insert(content);
      tx.remove(removed);
      last = to;
    }

    tx.retain(len - last);

    if depth_delta != 0 {
      debug!(delta = depth_delta, "refusing unbalanced transaction");
      return Err(StructureViolation::DepthChange { delta: depth_delta }.into());
    }

    Ok(tx)
  }

  /// Replaces one range with the given content.
  pub fn replace(
    seq: &ElementSequence,
    from: usize,
    to: usize,
    content: Vec<DataElement>,
  ) -> Result<Self> {
    Self::change(seq, std::iter::once((from, to, content)))
  }

  /// Builds the minimal transaction turning `seq[from..to]` into
  /// `content`: the longest common prefix and suffix are retained and only
  /// the differing middle is removed/inserted. This is how arbitrary view
  /// replacements become small transactions.
  pub fn from_replacement(
    seq: &ElementSequence,
    from: usize,
    to: usize,
    content: Vec<DataElement>,
  ) -> Result<Self> {
    if from > to {
      return Err(TransactionError::InvalidRange { from, to });
    }
    if to > seq.len() {
      return Err(TransactionError::RangeOutOfBounds {
        from,
        to,
        len: seq.len(),
      });
    }

    let old = seq.data(from..to);
    let max_common = old.len().min(content.len());

    let mut prefix = 0;
    while prefix < max_common && old[prefix] == content[prefix] {
      prefix += 1;
    }

    let mut suffix = 0;
    while suffix < max_common - prefix
      && old[old.len() - 1 - suffix] == content[content.len() - 1 - suffix]
    {
      suffix += 1;
    }

    let middle = content[prefix..content.len() - suffix].to_vec();
    Self::replace(seq, from + prefix, to - suffix, middle)
  }

  /// Sets (`Some`) or clears (`None`) one attribute of the open tag at
  /// `offset`, capturing the previous value for inversion.
  pub fn attribute_change(
    seq: &ElementSequence,
    offset: usize,
    key: impl Into<Tendril>,
    value: Option<Value>,
  ) -> Result<Self> {
    let key = key.into();
    let Some(DataElement::Open { attributes, .. }) = seq.get(offset) else {
      return Err(TransactionError::AttributeTarget { offset });
    };

    let mut tx = Self::default();
    tx.retain(offset);
    tx.set_attribute(key.clone(), attributes.get(key.as_str()).cloned(), value);
    tx.retain(seq.len() - offset);
    Ok(tx)
  }

  /// Applies (`set == true`) or clears an annotation over the content
  /// elements of `[from, to)`. Structural elements are retained untouched;
  /// content already in the requested state is retained too, keeping the
  /// transaction minimal.
  pub fn annotate(
    seq: &ElementSequence,
    from: usize,
    to: usize,
    annotation: &Annotation,
    set: bool,
  ) -> Result<Self> {
    if from > to {
      return Err(TransactionError::InvalidRange { from, to });
    }
    if to > seq.len() {
      return Err(TransactionError::RangeOutOfBounds {
        from,
        to,
        len: seq.len(),
      });
    }

    let mut tx = Self::default();
    tx.retain(from);

    for element in seq.data(from..to) {
      match element {
        DataElement::Text { ch, annotations }
          if annotations.contains(annotation) != set =>
        {
          let mut annotations = annotations.clone();
          if set {
            annotations.insert(annotation.clone());
          } else {
            annotations.remove(annotation);
          }
          tx.insert(vec![DataElement::annotated(*ch, annotations)]);
          tx.remove(vec![element.clone()]);
        },
        _ => tx.retain(1),
      }
    }

    tx.retain(seq.len() - to);
    Ok(tx)
  }
}
