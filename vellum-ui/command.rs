//! Command registry: string-keyed handlers dispatching into the
//! transaction engine.
//!
//! Commands run against an [`EditorTarget`] - the narrow slice of surface
//! behavior the UI needs (read the document, apply a transaction, undo,
//! redo). Arguments travel as JSON values, matching how UI chrome hands
//! them over. The registry is populated at startup; executing an
//! unregistered name is an error, not a panic.

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use vellum_model::{
  Tendril,
  annotation::Annotation,
  document::{
    ChangeEvent,
    Document,
  },
  element::text_elements,
  transaction::Transaction,
};
use vellum_surface::{
  adapter::RenderAdapter,
  sync::{
    Surface,
    SurfaceError,
    SyncOutcome,
  },
};

pub type CommandArgs = Value;
pub type Result<T> = std::result::Result<T, CommandError>;

#[derive(Debug, Error)]
pub enum CommandError {
  #[error("unknown command {0:?}")]
  Unknown(String),
  #[error("invalid arguments: {0}")]
  InvalidArguments(String),
  #[error("surface error: {0}")]
  Surface(#[from] SurfaceError),
}

/// The editing surface a command executes against.
pub trait EditorTarget {
  fn document(&self) -> &Document;
  fn apply(&mut self, tx: &Transaction) -> std::result::Result<ChangeEvent, SurfaceError>;
  fn undo(&mut self) -> std::result::Result<SyncOutcome, SurfaceError>;
  fn redo(&mut self) -> std::result::Result<SyncOutcome, SurfaceError>;
}

impl<A: RenderAdapter> EditorTarget for Surface<A> {
  fn document(&self) -> &Document {
    Surface::document(self)
  }

  fn apply(&mut self, tx: &Transaction) -> std::result::Result<ChangeEvent, SurfaceError> {
    Surface::apply(self, tx)
  }

  fn undo(&mut self) -> std::result::Result<SyncOutcome, SurfaceError> {
    Surface::undo(self)
  }

  fn redo(&mut self) -> std::result::Result<SyncOutcome, SurfaceError> {
    Surface::redo(self)
  }
}

type Handler = Box<dyn Fn(&mut dyn EditorTarget, &CommandArgs) -> Result<()> + Send + Sync>;

#[derive(Default)]
pub struct CommandRegistry {
  commands: HashMap<Tendril, Handler>,
}

impl CommandRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register<F>(&mut self, name: impl Into<Tendril>, handler: F)
  where
    F: Fn(&mut dyn EditorTarget, &CommandArgs) -> Result<()> + Send + Sync + 'static,
  {
    self.commands.insert(name.into(), Box::new(handler));
  }

  pub fn is_registered(&self, name: &str) -> bool {
    self.commands.contains_key(name)
  }

  pub fn execute(
    &self,
    name: &str,
    target: &mut dyn EditorTarget,
    args: &CommandArgs,
  ) -> Result<()> {
    let handler = self
      .commands
      .get(name)
      .ok_or_else(|| CommandError::Unknown(name.to_owned()))?;
    debug!(command = name, "executing command");
    handler(target, args)
  }

  /// The standard editing commands.
  pub fn builtin() -> Self {
    let mut registry = Self::new();

    registry.register("insertText", |target, args| {
      let text = required_str(args, "text", "insertText")?;
      let selection = target.document().selection();
      let tx = Transaction::replace(
        target.document().sequence(),
        selection.from(),
        selection.to(),
        text_elements(text),
      )
      .map_err(SurfaceError::from)?;
      target.apply(&tx)?;
      Ok(())
    });

    registry.register("delete", |target, _args| {
      let selection = target.document().selection();
      let tx = Transaction::replace(
        target.document().sequence(),
        selection.from(),
        selection.to(),
        Vec::new(),
      )
      .map_err(SurfaceError::from)?;
      target.apply(&tx)?;
      Ok(())
    });

    registry.register("annotate", |target, args| {
      let name = required_str(args, "name", "annotate")?;
      let set = args.get("set").and_then(Value::as_bool).unwrap_or(true);
      let selection = target.document().selection();
      let tx = Transaction::annotate(
        target.document().sequence(),
        selection.from(),
        selection.to(),
        &Annotation::new(name),
        set,
      )
      .map_err(SurfaceError::from)?;
      target.apply(&tx)?;
      Ok(())
    });

    registry.register("undo", |target, _args| {
      target.undo()?;
      Ok(())
    });

    registry.register("redo", |target, _args| {
      target.redo()?;
      Ok(())
    });

    registry
  }
}

fn required_str<'a>(args: &'a CommandArgs, key: &str, command: &str) -> Result<&'a str> {
  args.get(key).and_then(Value::as_str).ok_or_else(|| {
    CommandError::InvalidArguments(format!("{command} needs a {key:?} string"))
  })
}

#[cfg(test)]
mod test {
  use serde_json::json;
  use vellum_model::{
    element::DataElement,
    registry::NodeTypeRegistry,
    selection::Range,
    sequence::ElementSequence,
  };
  use vellum_surface::{
    adapter::MemoryAdapter,
    registry::ViewNodeRegistry,
  };

  use super::*;

  fn surface(text: &str) -> Surface<MemoryAdapter> {
    let mut elements = vec![DataElement::open("paragraph")];
    elements.extend(text_elements(text));
    elements.push(DataElement::close("paragraph"));
    let document = Document::new(ElementSequence::from_elements(elements)).unwrap();
    Surface::new(
      document,
      NodeTypeRegistry::builtin(),
      ViewNodeRegistry::builtin(),
      MemoryAdapter::new(),
    )
  }

  #[test]
  fn insert_text_replaces_the_selection() {
    let registry = CommandRegistry::builtin();
    let mut surface = surface("abc");
    surface.set_selection(Range::new(1, 4));

    registry
      .execute("insertText", &mut surface, &json!({ "text": "xy" }))
      .unwrap();
    let len = surface.document().len();
    assert_eq!(surface.document().sequence().text(0..len), "xy");
  }

  #[test]
  fn delete_then_undo_restores_content() {
    let registry = CommandRegistry::builtin();
    let mut surface = surface("abc");
    surface.set_selection(Range::new(1, 4));

    registry.execute("delete", &mut surface, &json!({})).unwrap();
    assert_eq!(surface.document().len(), 2);

    registry.execute("undo", &mut surface, &json!({})).unwrap();
    let len = surface.document().len();
    assert_eq!(surface.document().sequence().text(0..len), "abc");
  }

  #[test]
  fn annotate_applies_over_the_selection() {
    let registry = CommandRegistry::builtin();
    let mut surface = surface("abc");
    surface.set_selection(Range::new(2, 3));

    registry
      .execute("annotate", &mut surface, &json!({ "name": "bold" }))
      .unwrap();

    let bold = Annotation::new("bold");
    match &surface.document().data(2..3)[0] {
      DataElement::Text { annotations, .. } => assert!(annotations.contains(&bold)),
      other => panic!("expected text element, got {other:?}"),
    }
  }

  #[test]
  fn unknown_commands_and_bad_arguments_are_reported() {
    let registry = CommandRegistry::builtin();
    let mut surface = surface("a");

    assert!(matches!(
      registry.execute("transmogrify", &mut surface, &json!({})),
      Err(CommandError::Unknown(_))
    ));
    assert!(matches!(
      registry.execute("insertText", &mut surface, &json!({ "txet": "oops" })),
      Err(CommandError::InvalidArguments(_))
    ));
  }
}
