//! Rendering the projected tree through an adapter.
//!
//! Structural nodes render as one element each; a text run renders as a
//! sequence of sibling view nodes, one per run of identically-annotated
//! characters, with annotations nested outermost-first. Alien nodes render
//! as an opaque marker element.

use vellum_model::{
  element::DataElement,
  sequence::ElementSequence,
  tree::{
    Node,
    NodeClass,
    Tree,
  },
};

use crate::{
  adapter::{
    RenderAdapter,
    ViewId,
  },
  registry::ViewNodeRegistry,
};

fn attribute_text(value: &serde_json::Value) -> String {
  match value {
    serde_json::Value::String(text) => text.clone(),
    other => other.to_string(),
  }
}

/// Renders the whole document, returning the surface root element.
pub fn render_document<A: RenderAdapter>(
  adapter: &mut A,
  registry: &ViewNodeRegistry,
  seq: &ElementSequence,
  tree: &Tree,
) -> ViewId {
  let root = adapter.create_element("div");
  adapter.set_attribute(root, "class", "vellum-surface");
  for child in tree.root().children() {
    for id in render_node(adapter, registry, seq, child) {
      adapter.append_child(root, id);
    }
  }
  root
}

/// Renders one projected node. Text runs may produce several siblings;
/// structural nodes produce exactly one element.
pub fn render_node<A: RenderAdapter>(
  adapter: &mut A,
  registry: &ViewNodeRegistry,
  seq: &ElementSequence,
  node: &Node,
) -> Vec<ViewId> {
  match node.class() {
    NodeClass::Text => render_text_run(adapter, seq, node),
    NodeClass::Alien => {
      let element = adapter.create_element("div");
      adapter.set_attribute(element, "data-alien-type", node.node_type());
      vec![element]
    },
    _ => {
      let spec = registry.lookup_or_alien(node.node_type());
      let attributes = match seq.get(node.range().start) {
        Some(DataElement::Open { attributes, .. }) => Some(attributes),
        _ => None,
      };

      let element = adapter.create_element(&spec.resolve_tag(attributes));
      if let Some(attributes) = attributes {
        for key in &spec.forwarded_attributes {
          if let Some(value) = attributes.get(key.as_str()) {
            adapter.set_attribute(element, key, &attribute_text(value));
          }
        }
      }

      for child in node.children() {
        for id in render_node(adapter, registry, seq, child) {
          adapter.append_child(element, id);
        }
      }
      vec![element]
    },
  }
}

fn render_text_run<A: RenderAdapter>(
  adapter: &mut A,
  seq: &ElementSequence,
  node: &Node,
) -> Vec<ViewId> {
  let elements = seq.data(node.range());
  let mut out = Vec::new();
  let mut i = 0;

  while i < elements.len() {
    let DataElement::Text { annotations, .. } = &elements[i] else {
      i += 1;
      continue;
    };

    let mut text = String::new();
    while i < elements.len() {
      match &elements[i] {
        DataElement::Text { ch, annotations: a } if a == annotations => {
          text.push(*ch);
          i += 1;
        },
        _ => break,
      }
    }

    let mut iter = annotations.iter();
    let Some(first) = iter.next() else {
      out.push(adapter.create_text(&text));
      continue;
    };

    // Nest annotation wrappers outermost-first, text innermost.
    let top = adapter.create_element(&first.name);
    for (key, value) in &first.attributes {
      adapter.set_attribute(top, key, &attribute_text(value));
    }
    let mut current = top;
    for annotation in iter {
      let wrapper = adapter.create_element(&annotation.name);
      for (key, value) in &annotation.attributes {
        adapter.set_attribute(wrapper, key, &attribute_text(value));
      }
      adapter.append_child(current, wrapper);
      current = wrapper;
    }
    let content = adapter.create_text(&text);
    adapter.append_child(current, content);
    out.push(top);
  }

  out
}

#[cfg(test)]
mod test {
  use serde_json::Value;
  use vellum_model::{
    annotation::Annotation,
    element::text_elements,
    registry::NodeTypeRegistry,
    transaction::Transaction,
  };

  use super::*;
  use crate::adapter::MemoryAdapter;

  fn project(seq: &ElementSequence) -> Tree {
    Tree::build(seq, &NodeTypeRegistry::builtin())
  }

  #[test]
  fn renders_structure_and_text() {
    let mut elements = vec![DataElement::open("paragraph")];
    elements.extend(text_elements("hi"));
    elements.push(DataElement::close("paragraph"));
    let seq = ElementSequence::from_elements(elements);

    let mut adapter = MemoryAdapter::new();
    let registry = ViewNodeRegistry::builtin();
    let root = render_document(&mut adapter, &registry, &seq, &project(&seq));

    assert_eq!(adapter.children(root).len(), 1);
    let paragraph = adapter.children(root)[0];
    assert_eq!(adapter.tag(paragraph), Some("p"));
    assert_eq!(adapter.text_content(root), "hi");
  }

  #[test]
  fn heading_level_picks_the_tag() {
    let mut attributes = vellum_model::element::Attributes::new();
    attributes.insert("level".into(), Value::from(2));
    let seq = ElementSequence::from_elements(vec![
      DataElement::open_with("heading", attributes),
      DataElement::text('t'),
      DataElement::close("heading"),
    ]);

    let mut adapter = MemoryAdapter::new();
    let registry = ViewNodeRegistry::builtin();
    let root = render_document(&mut adapter, &registry, &seq, &project(&seq));

    let heading = adapter.children(root)[0];
    assert_eq!(adapter.tag(heading), Some("h2"));
    assert_eq!(adapter.attribute(heading, "level"), Some("2"));
  }

  #[test]
  fn annotated_runs_nest_wrappers() {
    let bold = Annotation::new("bold");
    let mut elements = vec![DataElement::open("paragraph")];
    elements.extend(text_elements("abc"));
    elements.push(DataElement::close("paragraph"));
    let seq = ElementSequence::from_elements(elements);
    let annotated = Transaction::annotate(&seq, 2, 3, &bold, true)
      .unwrap()
      .apply(&seq)
      .unwrap();

    let mut adapter = MemoryAdapter::new();
    let registry = ViewNodeRegistry::builtin();
    let root = render_document(&mut adapter, &registry, &annotated, &project(&annotated));

    let paragraph = adapter.children(root)[0];
    // "a", <bold>b</bold>, "c"
    assert_eq!(adapter.children(paragraph).len(), 3);
    let wrapper = adapter.children(paragraph)[1];
    assert_eq!(adapter.tag(wrapper), Some("bold"));
    assert_eq!(adapter.text_content(wrapper), "b");
    assert_eq!(adapter.text_content(root), "abc");
  }

  #[test]
  fn alien_nodes_render_as_markers() {
    let seq = ElementSequence::from_elements(vec![
      DataElement::open("holograph"),
      DataElement::text('x'),
      DataElement::close("holograph"),
    ]);

    let mut adapter = MemoryAdapter::new();
    let registry = ViewNodeRegistry::builtin();
    let root = render_document(&mut adapter, &registry, &seq, &project(&seq));

    let alien = adapter.children(root)[0];
    assert_eq!(adapter.attribute(alien, "data-alien-type"), Some("holograph"));
  }
}
