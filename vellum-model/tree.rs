//! Tree projection of the linear sequence.
//!
//! The tree is derived state: every node owns a contiguous element span
//! and the tree can always be rebuilt from the sequence alone. On a commit
//! the projection is updated incrementally - only the deepest branch whose
//! span safely encloses the dirty range is re-parsed, and everything after
//! the dirty range shifts by the length delta without re-parsing. The
//! correctness bar is exact structural equality with a from-scratch
//! rebuild, which the tests check differentially.
//!
//! Node classification comes from the [`NodeTypeRegistry`]; unregistered
//! types project as opaque alien nodes (resized, never re-parsed).

use std::ops::Range as Span;

use crate::{
  Tendril,
  document::ChangeEvent,
  element::DataElement,
  registry::NodeTypeRegistry,
  sequence::ElementSequence,
};

/// Name of the synthetic node covering a run of text elements.
pub const TEXT_TYPE: &str = "text";

/// Name of the synthetic root node.
pub const DOCUMENT_TYPE: &str = "document";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeClass {
  /// Structural node containing further structure.
  Branch,
  /// Structural node containing content (text runs and inline nodes).
  ContentBranch,
  /// Run of consecutive text elements.
  Text,
  /// Inline content node.
  Leaf,
  /// Unregistered content, kept opaque.
  Alien,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
  node_type: Tendril,
  class:     NodeClass,
  /// Element span owned by this node, open and close tags included.
  range:     Span<usize>,
  children:  Vec<Node>,
}

impl Node {
  pub fn node_type(&self) -> &str {
    &self.node_type
  }

  pub fn class(&self) -> NodeClass {
    self.class
  }

  pub fn range(&self) -> Span<usize> {
    self.range.clone()
  }

  pub fn len(&self) -> usize {
    self.range.end - self.range.start
  }

  pub fn children(&self) -> &[Node] {
    &self.children
  }

  /// The deepest node whose span contains `offset`; `self` if none of the
  /// children do.
  pub fn node_at(&self, offset: usize) -> &Node {
    for child in &self.children {
      if child.range.contains(&offset) {
        return child.node_at(offset);
      }
    }
    self
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
  root: Node,
}

impl Tree {
  /// Projects the full sequence from scratch.
  pub fn build(seq: &ElementSequence, registry: &NodeTypeRegistry) -> Self {
    Self {
      root: Node {
        node_type: DOCUMENT_TYPE.into(),
        class:     NodeClass::Branch,
        range:     0..seq.len(),
        children:  parse_children(seq.elements(), 0..seq.len(), registry),
      },
    }
  }

  pub fn root(&self) -> &Node {
    &self.root
  }

  /// Updates the projection for one committed change. `seq` is the
  /// post-state sequence; `event.old_range` addresses the pre-state.
  pub fn apply_change(
    &mut self,
    seq: &ElementSequence,
    registry: &NodeTypeRegistry,
    event: &ChangeEvent,
  ) {
    update_node(
      &mut self.root,
      seq,
      registry,
      &event.old_range,
      event.delta,
      true,
    );
  }
}

fn classify(registry: &NodeTypeRegistry, name: &str) -> NodeClass {
  match registry.lookup(name) {
    None => NodeClass::Alien,
    Some(spec) if spec.is_content => NodeClass::Leaf,
    Some(spec) if spec.can_contain_content => NodeClass::ContentBranch,
    Some(_) => NodeClass::Branch,
  }
}

/// Offset of the close tag matching the open tag at `open_pos`, within
/// `limit`. On a well-nested span depth matching implies type matching.
fn matching_close(elements: &[DataElement], open_pos: usize, limit: usize) -> Option<usize> {
  let mut depth = 0isize;
  for (i, element) in elements[open_pos..limit].iter().enumerate() {
    depth += element.nesting();
    if depth == 0 {
      return Some(open_pos + i);
    }
  }
  None
}

fn parse_children(
  elements: &[DataElement],
  span: Span<usize>,
  registry: &NodeTypeRegistry,
) -> Vec<Node> {
  let mut children = Vec::new();
  let mut pos = span.start;

  while pos < span.end {
    match &elements[pos] {
      DataElement::Text { .. } => {
        let start = pos;
        while pos < span.end && matches!(elements[pos], DataElement::Text { .. }) {
          pos += 1;
        }
        children.push(Node {
          node_type: TEXT_TYPE.into(),
          class:     NodeClass::Text,
          range:     start..pos,
          children:  Vec::new(),
        });
      },
      DataElement::Open { node_type, .. } => {
        let Some(close) = matching_close(elements, pos, span.end) else {
          // Cannot happen on a well-nested span; keep the remainder opaque
          // rather than mis-parse it.
          children.push(Node {
            node_type: node_type.clone(),
            class:     NodeClass::Alien,
            range:     pos..span.end,
            children:  Vec::new(),
          });
          break;
        };

        let class = classify(registry, node_type);
        let nested = match class {
          NodeClass::Branch | NodeClass::ContentBranch => {
            parse_children(elements, pos + 1..close, registry)
          },
          _ => Vec::new(),
        };

        children.push(Node {
          node_type: node_type.clone(),
          class,
          range: pos..close + 1,
          children: nested,
        });
        pos = close + 1;
      },
      DataElement::Close { .. } => {
        debug_assert!(false, "stray close tag in a balanced span");
        pos += 1;
      },
    }
  }

  children
}

fn shift_offset(value: usize, delta: isize) -> usize {
  if delta >= 0 {
    value + delta as usize
  } else {
    value - delta.unsigned_abs()
  }
}

fn shift_node(node: &mut Node, delta: isize) {
  node.range = shift_offset(node.range.start, delta)..shift_offset(node.range.end, delta);
  for child in &mut node.children {
    shift_node(child, delta);
  }
}

fn span_balanced(elements: &[DataElement], span: Span<usize>) -> bool {
  let Some(slice) = elements.get(span) else {
    return false;
  };

  let mut depth = 0isize;
  for element in slice {
    depth += element.nesting();
    if depth < 0 {
      return false;
    }
  }
  depth == 0
}

/// Updates `node` for an edit whose pre-state dirty span lies within the
/// node's child span. The node's post-state child span must be balanced -
/// guaranteed globally for the root, and checked before every descent.
fn update_node(
  node: &mut Node,
  seq: &ElementSequence,
  registry: &NodeTypeRegistry,
  dirty: &Span<usize>,
  delta: isize,
  is_root: bool,
) {
  node.range.end = shift_offset(node.range.end, delta);

  // A child whose inner span strictly encloses the dirty range (open and
  // close tags untouched) can absorb the update. Text runs cannot: edits
  // may merge or split them, so the parent re-parses.
  let mut target = None;
  for (i, child) in node.children.iter().enumerate() {
    if child.range.start >= dirty.end {
      break;
    }
    let enclosed =
      child.range.start + 1 <= dirty.start && dirty.end <= child.range.end.saturating_sub(1);
    if enclosed && child.class != NodeClass::Text {
      target = Some(i);
      break;
    }
  }

  if let Some(i) = target {
    let child = &node.children[i];
    let inner_post = child.range.start + 1..shift_offset(child.range.end, delta) - 1;

    // If the edit rebalanced content across the child's boundary the child
    // is no longer self-contained; fall through and re-parse here.
    if span_balanced(seq.elements(), inner_post) {
      match child.class {
        NodeClass::Branch | NodeClass::ContentBranch => {
          update_node(&mut node.children[i], seq, registry, dirty, delta, false);
        },
        _ => {
          // Opaque nodes (alien, inline leaves) resize without re-parsing.
          node.children[i].range.end = shift_offset(node.children[i].range.end, delta);
        },
      }
      for sibling in &mut node.children[i + 1..] {
        shift_node(sibling, delta);
      }
      return;
    }
  }

  let span = if is_root {
    0..seq.len()
  } else {
    node.range.start + 1..node.range.end - 1
  };
  node.children = parse_children(seq.elements(), span, registry);
}
