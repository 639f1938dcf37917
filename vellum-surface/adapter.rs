//! Rendering/DOM adapter contract.
//!
//! The surface never touches a real DOM: it drives an implementation of
//! [`RenderAdapter`], which exposes the handful of mutations rendering
//! needs. [`MemoryAdapter`] is the in-memory implementation used by tests
//! and headless rendering; it can also linearize a view subtree back into
//! data elements, which is what a mutation observer does in a live
//! embedding.

use vellum_model::{
  Tendril,
  element::DataElement,
  registry::NodeTypeRegistry,
};

/// Opaque handle to one view node, issued by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(usize);

pub trait RenderAdapter {
  fn create_element(&mut self, tag: &str) -> ViewId;
  fn create_text(&mut self, text: &str) -> ViewId;
  fn set_attribute(&mut self, node: ViewId, key: &str, value: &str);
  fn set_text(&mut self, node: ViewId, text: &str);
  fn append_child(&mut self, parent: ViewId, child: ViewId);
  /// Inserts before `reference`, or appends when `reference` is `None`.
  fn insert_before(&mut self, parent: ViewId, child: ViewId, reference: Option<ViewId>);
  /// Detaches a node (and its subtree) from its parent.
  fn remove_node(&mut self, node: ViewId);
  fn clear_children(&mut self, node: ViewId);
}

#[derive(Debug, Default)]
struct MemNode {
  /// `None` for text nodes.
  tag:        Option<Tendril>,
  text:       String,
  attributes: Vec<(String, String)>,
  children:   Vec<ViewId>,
  parent:     Option<ViewId>,
}

/// Arena-backed in-memory view. Detached nodes stay in the arena; handles
/// remain valid for the adapter's lifetime.
#[derive(Debug, Default)]
pub struct MemoryAdapter {
  nodes: Vec<MemNode>,
}

impl MemoryAdapter {
  pub fn new() -> Self {
    Self::default()
  }

  fn push(&mut self, node: MemNode) -> ViewId {
    self.nodes.push(node);
    ViewId(self.nodes.len() - 1)
  }

  fn node(&self, id: ViewId) -> &MemNode {
    &self.nodes[id.0]
  }

  fn detach(&mut self, id: ViewId) {
    if let Some(parent) = self.nodes[id.0].parent.take() {
      self.nodes[parent.0].children.retain(|child| *child != id);
    }
  }

  pub fn tag(&self, id: ViewId) -> Option<&str> {
    self.node(id).tag.as_deref()
  }

  pub fn attribute(&self, id: ViewId, key: &str) -> Option<&str> {
    self
      .node(id)
      .attributes
      .iter()
      .rev()
      .find(|(k, _)| k == key)
      .map(|(_, v)| v.as_str())
  }

  pub fn children(&self, id: ViewId) -> &[ViewId] {
    &self.node(id).children
  }

  /// Concatenated text of the subtree, in document order.
  pub fn text_content(&self, id: ViewId) -> String {
    let node = self.node(id);
    if node.tag.is_none() {
      return node.text.clone();
    }
    node
      .children
      .iter()
      .map(|child| self.text_content(*child))
      .collect()
  }

  /// Converts a view subtree back into linear-model elements. Element tags
  /// resolve through the registry's matching rules; an unclaimed tag is
  /// passed through as a node type of its own (the model projects it as
  /// alien rather than failing).
  pub fn linearize(&self, id: ViewId, registry: &NodeTypeRegistry) -> Vec<DataElement> {
    let mut out = Vec::new();
    self.linearize_into(id, registry, &mut out);
    out
  }

  fn linearize_into(&self, id: ViewId, registry: &NodeTypeRegistry, out: &mut Vec<DataElement>) {
    let node = self.node(id);
    match &node.tag {
      None => out.extend(node.text.chars().map(DataElement::text)),
      Some(tag) => {
        let node_type: Tendril = match registry.match_tag(tag) {
          Some(spec) => spec.name.clone(),
          None => tag.clone(),
        };
        out.push(DataElement::open(node_type.clone()));
        for child in &node.children {
          self.linearize_into(*child, registry, out);
        }
        out.push(DataElement::close(node_type));
      },
    }
  }
}

impl RenderAdapter for MemoryAdapter {
  fn create_element(&mut self, tag: &str) -> ViewId {
    self.push(MemNode {
      tag: Some(Tendril::from(tag)),
      ..MemNode::default()
    })
  }

  fn create_text(&mut self, text: &str) -> ViewId {
    self.push(MemNode {
      text: text.to_owned(),
      ..MemNode::default()
    })
  }

  fn set_attribute(&mut self, node: ViewId, key: &str, value: &str) {
    self.nodes[node.0]
      .attributes
      .push((key.to_owned(), value.to_owned()));
  }

  fn set_text(&mut self, node: ViewId, text: &str) {
    self.nodes[node.0].text = text.to_owned();
  }

  fn append_child(&mut self, parent: ViewId, child: ViewId) {
    self.detach(child);
    self.nodes[child.0].parent = Some(parent);
    self.nodes[parent.0].children.push(child);
  }

  fn insert_before(&mut self, parent: ViewId, child: ViewId, reference: Option<ViewId>) {
    self.detach(child);
    self.nodes[child.0].parent = Some(parent);
    let children = &mut self.nodes[parent.0].children;
    let index = reference
      .and_then(|r| children.iter().position(|c| *c == r))
      .unwrap_or(children.len());
    children.insert(index, child);
  }

  fn remove_node(&mut self, node: ViewId) {
    self.detach(node);
  }

  fn clear_children(&mut self, node: ViewId) {
    let children = std::mem::take(&mut self.nodes[node.0].children);
    for child in children {
      self.nodes[child.0].parent = None;
    }
  }
}
