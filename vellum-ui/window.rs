//! Window/dialog lifecycle.
//!
//! Windows follow a three-phase contract: `initialize` once at
//! registration, `setup` with context each time the window opens, and
//! `teardown` with the closing outcome. A teardown under
//! [`WindowAction::Apply`] returns the transactions realizing the user's
//! edits (canonically an attribute change against the focused node), which
//! the manager commits through the target; any other action commits
//! nothing.

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use vellum_model::{
  Tendril,
  document::Document,
  transaction::Transaction,
};
use vellum_surface::sync::SurfaceError;

use crate::command::EditorTarget;

pub type Result<T> = std::result::Result<T, WindowError>;

#[derive(Debug, Error)]
pub enum WindowError {
  #[error("unknown window {0:?}")]
  Unknown(String),
  #[error("window {0:?} is already open")]
  AlreadyOpen(String),
  #[error("no window is open")]
  NoneOpen,
  #[error("surface error: {0}")]
  Surface(#[from] SurfaceError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowAction {
  Apply,
  Cancel,
}

/// Context handed to a window when it opens.
#[derive(Debug, Clone, Default)]
pub struct WindowData {
  /// Offset of the open element the window is editing, when there is one.
  pub focused: Option<usize>,
  pub payload: Value,
}

/// Result handed to a window when it closes.
#[derive(Debug, Clone)]
pub struct WindowOutcome {
  pub action:  WindowAction,
  pub payload: Value,
}

pub trait Window {
  /// One-time setup at registration.
  fn initialize(&mut self) {}

  /// Receives context when the window opens.
  fn setup(&mut self, data: &WindowData);

  /// Receives the closing outcome. Transactions returned here are
  /// committed by the manager when the action is [`WindowAction::Apply`].
  fn teardown(&mut self, outcome: &WindowOutcome, document: &Document) -> Vec<Transaction>;
}

#[derive(Default)]
pub struct WindowManager {
  windows: HashMap<Tendril, Box<dyn Window>>,
  open:    Option<Tendril>,
}

impl WindowManager {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&mut self, name: impl Into<Tendril>, mut window: Box<dyn Window>) {
    window.initialize();
    self.windows.insert(name.into(), window);
  }

  pub fn open_window(&self) -> Option<&str> {
    self.open.as_deref()
  }

  pub fn open(&mut self, name: &str, data: &WindowData) -> Result<()> {
    if let Some(open) = &self.open {
      return Err(WindowError::AlreadyOpen(open.to_string()));
    }
    let window = self
      .windows
      .get_mut(name)
      .ok_or_else(|| WindowError::Unknown(name.to_owned()))?;

    debug!(window = name, "opening window");
    window.setup(data);
    self.open = Some(Tendril::from(name));
    Ok(())
  }

  /// Closes the open window, committing its transactions when the outcome
  /// action is [`WindowAction::Apply`].
  pub fn close(&mut self, outcome: &WindowOutcome, target: &mut dyn EditorTarget) -> Result<()> {
    let name = self.open.take().ok_or(WindowError::NoneOpen)?;
    let window = self
      .windows
      .get_mut(&name)
      .ok_or_else(|| WindowError::Unknown(name.to_string()))?;

    let transactions = window.teardown(outcome, target.document());
    debug!(window = %name, action = ?outcome.action, "closing window");

    if outcome.action == WindowAction::Apply {
      for tx in &transactions {
        target.apply(tx)?;
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod test {
  use serde_json::json;
  use vellum_model::{
    element::{
      DataElement,
      text_elements,
    },
    registry::NodeTypeRegistry,
    sequence::ElementSequence,
  };
  use vellum_surface::{
    adapter::MemoryAdapter,
    registry::ViewNodeRegistry,
    sync::Surface,
  };

  use super::*;

  /// A dialog that edits one attribute of the focused node, the way a
  /// node-settings dialog does.
  #[derive(Default)]
  struct AttributeWindow {
    focused: Option<usize>,
    key:     String,
  }

  impl Window for AttributeWindow {
    fn setup(&mut self, data: &WindowData) {
      self.focused = data.focused;
      self.key = data
        .payload
        .get("key")
        .and_then(Value::as_str)
        .unwrap_or("style")
        .to_owned();
    }

    fn teardown(&mut self, outcome: &WindowOutcome, document: &Document) -> Vec<Transaction> {
      let Some(offset) = self.focused.take() else {
        return Vec::new();
      };
      let value = outcome.payload.get("value").cloned();
      match Transaction::attribute_change(document.sequence(), offset, self.key.as_str(), value) {
        Ok(tx) => vec![tx],
        Err(_) => Vec::new(),
      }
    }
  }

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

  fn manager() -> WindowManager {
    let mut manager = WindowManager::new();
    manager.register("nodeSettings", Box::new(AttributeWindow::default()));
    manager
  }

  #[test]
  fn apply_outcome_commits_the_window_transactions() {
    let mut manager = manager();
    let mut surface = surface("a");

    manager
      .open("nodeSettings", &WindowData {
        focused: Some(0),
        payload: json!({ "key": "style" }),
      })
      .unwrap();
    manager
      .close(
        &WindowOutcome {
          action:  WindowAction::Apply,
          payload: json!({ "value": "center" }),
        },
        &mut surface,
      )
      .unwrap();

    assert_eq!(
      surface.document().data(0..1)[0].attribute("style"),
      Some(&Value::from("center"))
    );
    assert_eq!(surface.document().history().undo_depth(), 1);
  }

  #[test]
  fn cancel_outcome_commits_nothing() {
    let mut manager = manager();
    let mut surface = surface("a");

    manager
      .open("nodeSettings", &WindowData {
        focused: Some(0),
        payload: json!({}),
      })
      .unwrap();
    manager
      .close(
        &WindowOutcome {
          action:  WindowAction::Cancel,
          payload: json!({ "value": "center" }),
        },
        &mut surface,
      )
      .unwrap();

    assert_eq!(surface.document().data(0..1)[0].attribute("style"), None);
    assert_eq!(surface.document().history().undo_depth(), 0);
  }

  #[test]
  fn lifecycle_errors_are_reported() {
    let mut manager = manager();
    let mut surface = surface("a");

    assert!(matches!(
      manager.open("missing", &WindowData::default()),
      Err(WindowError::Unknown(_))
    ));
    assert!(matches!(
      manager.close(
        &WindowOutcome {
          action:  WindowAction::Cancel,
          payload: Value::Null,
        },
        &mut surface,
      ),
      Err(WindowError::NoneOpen)
    ));

    manager.open("nodeSettings", &WindowData::default()).unwrap();
    assert!(matches!(
      manager.open("nodeSettings", &WindowData::default()),
      Err(WindowError::AlreadyOpen(_))
    ));
  }
}
