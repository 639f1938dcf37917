//! Surface synchronizer: keeps the live view consistent with the model.
//!
//! The synchronizer is a state machine over [`SyncState`]:
//!
//! - **Idle** - nothing in flight.
//! - **Observing** - a view mutation report is being reconciled into a
//!   transaction.
//! - **Applying** - a model→view patch is in flight. Mutation reports
//!   arriving in this state are the echoes of the patch itself and are
//!   suppressed, which is what breaks the feedback loop between the model
//!   and a mutation-observed view.
//!
//! Because view embeddings deliver mutation notifications asynchronously,
//! the synchronizer stays in `Applying` after patching until the embedder
//! calls [`Surface::acknowledge`], signalling that the notifications caused
//! by the patch have drained.
//!
//! Every committed change flows in a fixed order: document commit, tree
//! projection update, view patch, after which the remapped selection is
//! already in place. If a view report cannot be reconciled (it describes
//! content the model refuses, or the view no longer lines up with the
//! projection) the synchronizer does not attempt a partial repair: it
//! re-renders everything from the linear store, which is authoritative.

use std::ops::Range as Span;

use thiserror::Error;
use tracing::{
  debug,
  warn,
};
use vellum_model::{
  document::{
    ChangeEvent,
    Document,
    DocumentError,
  },
  element::DataElement,
  history::{
    EditOrigin,
    HistoryError,
  },
  registry::NodeTypeRegistry,
  selection::Range,
  transaction::{
    Transaction,
    TransactionError,
  },
  tree::{
    Node,
    Tree,
  },
};

use crate::{
  adapter::{
    RenderAdapter,
    ViewId,
  },
  registry::ViewNodeRegistry,
  render::render_node,
};

pub type Result<T> = std::result::Result<T, SurfaceError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SurfaceError {
  #[error("document error: {0}")]
  Document(#[from] DocumentError),
  #[error("transaction error: {0}")]
  Transaction(#[from] TransactionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
  Idle,
  Observing,
  Applying,
}

/// What became of one synchronizer input.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
  /// A transaction was committed and the view patched.
  Applied(ChangeEvent),
  /// Nothing to do (no-op mutation, empty history).
  Unchanged,
  /// The report was an echo of our own patch and was ignored.
  Suppressed,
  /// The view had diverged; it was re-rendered from the store.
  Recovered,
}

/// A view-originated edit: the embedder re-linearized a span of the view
/// and reports the model range it corresponds to plus the new content.
#[derive(Debug, Clone)]
pub struct ViewMutation {
  pub from:    usize,
  pub to:      usize,
  pub content: Vec<DataElement>,
}

/// The live editable surface: a document, its tree projection, and a
/// rendered view, kept consistent through the synchronizer.
#[derive(Debug)]
pub struct Surface<A: RenderAdapter> {
  document:      Document,
  tree:          Tree,
  node_registry: NodeTypeRegistry,
  view_registry: ViewNodeRegistry,
  adapter:       A,
  root_view:     ViewId,
  /// Per top-level projected node: its element span and the view nodes
  /// rendering it (a text run renders as several siblings).
  view_children: Vec<(Span<usize>, Vec<ViewId>)>,
  state:         SyncState,
  suppressed:    u64,
}

impl<A: RenderAdapter> Surface<A> {
  pub fn new(
    document: Document,
    node_registry: NodeTypeRegistry,
    view_registry: ViewNodeRegistry,
    mut adapter: A,
  ) -> Self {
    let tree = Tree::build(document.sequence(), &node_registry);
    let root_view = adapter.create_element("div");
    adapter.set_attribute(root_view, "class", "vellum-surface");

    let mut surface = Self {
      document,
      tree,
      node_registry,
      view_registry,
      adapter,
      root_view,
      view_children: Vec::new(),
      state: SyncState::Idle,
      suppressed: 0,
    };
    surface.rerender();
    surface
  }

  /// The document model backing this surface.
  pub fn document(&self) -> &Document {
    &self.document
  }

  pub fn tree(&self) -> &Tree {
    &self.tree
  }

  pub fn state(&self) -> SyncState {
    self.state
  }

  pub fn adapter(&self) -> &A {
    &self.adapter
  }

  pub fn root_view(&self) -> ViewId {
    self.root_view
  }

  pub fn node_registry(&self) -> &NodeTypeRegistry {
    &self.node_registry
  }

  /// Number of self-caused mutation reports suppressed so far.
  pub fn suppressed(&self) -> u64 {
    self.suppressed
  }

  pub fn set_selection(&mut self, selection: Range) {
    self.document.set_selection(selection);
  }

  /// Commits a programmatic transaction and patches the view. Leaves the
  /// synchronizer in `Applying`; call [`acknowledge`](Self::acknowledge)
  /// once the resulting view notifications have drained.
  pub fn apply(&mut self, tx: &Transaction) -> Result<ChangeEvent> {
    self.apply_with(tx, EditOrigin::User, false)
  }

  pub fn apply_with(
    &mut self,
    tx: &Transaction,
    origin: EditOrigin,
    continuable: bool,
  ) -> Result<ChangeEvent> {
    let event = self.document.commit_with(tx, origin, continuable)?;
    self
      .tree
      .apply_change(self.document.sequence(), &self.node_registry, &event);
    self.patch_view(&event);
    Ok(event)
  }

  /// Handles one view mutation report from the embedder.
  pub fn on_view_mutation(&mut self, mutation: ViewMutation) -> SyncOutcome {
    if self.state == SyncState::Applying {
      self.suppressed += 1;
      debug!("suppressed self-caused view mutation");
      return SyncOutcome::Suppressed;
    }

    self.state = SyncState::Observing;
    match self.reconcile(mutation) {
      Ok(Some(event)) => SyncOutcome::Applied(event),
      Ok(None) => {
        self.state = SyncState::Idle;
        SyncOutcome::Unchanged
      },
      Err(error) => {
        warn!(%error, "view diverged from model, re-rendering from the store");
        self.state = SyncState::Applying;
        self.rerender();
        SyncOutcome::Recovered
      },
    }
  }

  fn reconcile(&mut self, mutation: ViewMutation) -> Result<Option<ChangeEvent>> {
    let tx = Transaction::from_replacement(
      self.document.sequence(),
      mutation.from,
      mutation.to,
      mutation.content,
    )?;
    if tx.is_identity() {
      return Ok(None);
    }

    // View edits are continuable: bursts of typing squash into one undo
    // step until the selection moves.
    let event = self.document.commit_with(&tx, EditOrigin::User, true)?;
    self
      .tree
      .apply_change(self.document.sequence(), &self.node_registry, &event);
    self.patch_view(&event);
    Ok(Some(event))
  }

  /// Reverts the latest history entry and patches the view. An empty
  /// history is a reported no-op, not an error.
  pub fn undo(&mut self) -> Result<SyncOutcome> {
    match self.document.undo() {
      Ok(event) => {
        self
          .tree
          .apply_change(self.document.sequence(), &self.node_registry, &event);
        self.patch_view(&event);
        Ok(SyncOutcome::Applied(event))
      },
      Err(DocumentError::History(HistoryError::EmptyHistory)) => {
        debug!("undo past the history boundary");
        Ok(SyncOutcome::Unchanged)
      },
      Err(error) => Err(error.into()),
    }
  }

  pub fn redo(&mut self) -> Result<SyncOutcome> {
    match self.document.redo() {
      Ok(event) => {
        self
          .tree
          .apply_change(self.document.sequence(), &self.node_registry, &event);
        self.patch_view(&event);
        Ok(SyncOutcome::Applied(event))
      },
      Err(DocumentError::History(HistoryError::EmptyHistory)) => {
        debug!("redo past the history boundary");
        Ok(SyncOutcome::Unchanged)
      },
      Err(error) => Err(error.into()),
    }
  }

  /// Signals that the mutation notifications caused by the last patch have
  /// drained; the synchronizer returns to `Idle`.
  pub fn acknowledge(&mut self) {
    self.state = SyncState::Idle;
  }

  /// Authoritative-source recovery: rebuild the projection and the whole
  /// view from the linear store. Leaves the synchronizer in `Applying`.
  pub fn resync(&mut self) {
    self.state = SyncState::Applying;
    self.rerender();
  }

  /// Patches the view for one change: the affected top-level children are
  /// re-rendered, everything else is left alone.
  fn patch_view(&mut self, event: &ChangeEvent) {
    self.state = SyncState::Applying;

    // Window of old view children intersecting the pre-state dirty span.
    let start = self
      .view_children
      .iter()
      .position(|(span, _)| span.end > event.old_range.start)
      .unwrap_or(self.view_children.len());
    let mut end = start;
    while end < self.view_children.len() && self.view_children[end].0.start < event.old_range.end {
      end += 1;
    }

    // Window of projected children intersecting the post-state dirty span.
    let new_children: Vec<Node> = {
      let children = self.tree.root().children();
      let new_start = children
        .iter()
        .position(|node| node.range().end > event.new_range.start)
        .unwrap_or(children.len());
      let mut new_end = new_start;
      while new_end < children.len() && children[new_end].range().start < event.new_range.end {
        new_end += 1;
      }
      children[new_start..new_end].to_vec()
    };

    for (_, ids) in &self.view_children[start..end] {
      for id in ids {
        self.adapter.remove_node(*id);
      }
    }
    let reference = self
      .view_children
      .get(end)
      .and_then(|(_, ids)| ids.first().copied());

    let mut rendered = Vec::with_capacity(new_children.len());
    for node in &new_children {
      let ids = render_node(
        &mut self.adapter,
        &self.view_registry,
        self.document.sequence(),
        node,
      );
      for id in &ids {
        self.adapter.insert_before(self.root_view, *id, reference);
      }
      rendered.push((node.range(), ids));
    }
    self.view_children.splice(start..end, rendered);

    // The view child list must mirror the projection exactly; anything
    // else means the patch went wrong and the store takes over.
    let aligned = self.view_children.len() == self.tree.root().children().len()
      && self
        .view_children
        .iter()
        .zip(self.tree.root().children())
        .all(|((span, _), node)| *span == node.range());
    if !aligned {
      warn!("view children misaligned after patch, re-rendering from the store");
      self.rerender();
    }
  }

  fn rerender(&mut self) {
    self.tree = Tree::build(self.document.sequence(), &self.node_registry);
    self.adapter.clear_children(self.root_view);

    let mut view_children = Vec::new();
    for node in self.tree.root().children().to_vec() {
      let ids = render_node(
        &mut self.adapter,
        &self.view_registry,
        self.document.sequence(),
        &node,
      );
      for id in &ids {
        self.adapter.append_child(self.root_view, *id);
      }
      view_children.push((node.range(), ids));
    }
    self.view_children = view_children;
  }
}
