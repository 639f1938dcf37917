//! Cancellable lookup input feeding a suggestion menu.
//!
//! Every query change supersedes the previous request: the old request's
//! abort handle is triggered and a fresh generation-stamped
//! [`LookupRequest`] is issued. Responses are delivered back with their
//! generation; anything stale - aborted, or belonging to an older query -
//! is discarded, so only the current query's results ever populate the
//! menu. Service failures degrade to a visible "no results" state rather
//! than surfacing an error.
//!
//! [`LookupHook`] wires the input to a service through the debounced hook
//! machinery: keystrokes stream in, at most one request per debounce
//! window goes out.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::{
  sync::mpsc::Sender,
  time::Instant,
};
use tracing::{
  debug,
  warn,
};
use vellum_event::{
  AbortHandle,
  DebouncedHook,
};
use vellum_model::Tendril;

pub type Result<T> = std::result::Result<T, LookupError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
  #[error("lookup request failed: {0}")]
  Request(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupItemKind {
  /// An item the service knows.
  Existing,
  /// Synthesized entry offering to create what the user typed.
  New,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LookupItem {
  pub label:   Tendril,
  pub kind:    LookupItemKind,
  pub payload: Value,
}

impl LookupItem {
  pub fn existing(label: impl Into<Tendril>) -> Self {
    Self {
      label:   label.into(),
      kind:    LookupItemKind::Existing,
      payload: Value::Null,
    }
  }

  pub fn new_entry(label: impl Into<Tendril>) -> Self {
    Self {
      label:   label.into(),
      kind:    LookupItemKind::New,
      payload: Value::Null,
    }
  }

  pub fn with_payload(mut self, payload: Value) -> Self {
    self.payload = payload;
    self
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MenuState {
  /// No query.
  #[default]
  Empty,
  /// A request is in flight.
  Loading,
  /// The query produced nothing (or the service failed).
  NoResults,
  Results,
}

/// One issued request. Feed the query to the service and deliver the
/// outcome back with the same generation.
#[derive(Debug, Clone)]
pub struct LookupRequest {
  pub query:      String,
  pub generation: u64,
  pub abort:      AbortHandle,
}

/// The source of suggestions.
pub trait LookupService: Send + 'static {
  /// Long-running implementations should poll `abort` and bail early.
  fn fetch(&mut self, query: &str, abort: &AbortHandle) -> Result<Vec<LookupItem>>;
}

#[derive(Debug, Default)]
pub struct LookupInput {
  query:      String,
  generation: u64,
  pending:    Option<(u64, AbortHandle)>,
  items:      Vec<LookupItem>,
  state:      MenuState,
}

impl LookupInput {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn query(&self) -> &str {
    &self.query
  }

  pub fn state(&self) -> MenuState {
    self.state
  }

  pub fn items(&self) -> &[LookupItem] {
    &self.items
  }

  pub fn has_pending(&self) -> bool {
    self.pending.is_some()
  }

  /// Updates the query. Any in-flight request is aborted; a non-empty new
  /// query yields a request to hand to the service, an empty one just
  /// clears the menu.
  pub fn set_query(&mut self, query: &str) -> Option<LookupRequest> {
    if query == self.query {
      return None;
    }

    self.query = query.to_owned();
    self.generation += 1;

    if let Some((generation, abort)) = self.pending.take() {
      debug!(generation, "aborting superseded lookup request");
      abort.abort();
    }

    if query.trim().is_empty() {
      self.items.clear();
      self.state = MenuState::Empty;
      return None;
    }

    let abort = AbortHandle::new();
    self.pending = Some((self.generation, abort.clone()));
    self.state = MenuState::Loading;
    Some(LookupRequest {
      query: self.query.clone(),
      generation: self.generation,
      abort,
    })
  }

  /// Delivers a response. Returns whether it was accepted: stale responses
  /// (aborted or superseded) are discarded without touching the menu.
  pub fn deliver(&mut self, generation: u64, result: Result<Vec<LookupItem>>) -> bool {
    match &self.pending {
      Some((pending, abort)) if *pending == generation && !abort.is_aborted() => {},
      _ => {
        debug!(generation, "discarding stale lookup response");
        return false;
      },
    }
    self.pending = None;

    match result {
      Err(error) => {
        warn!(%error, "lookup failed, showing no results");
        self.items.clear();
        self.state = MenuState::NoResults;
      },
      Ok(mut items) => {
        let query = self.query.trim();
        let exact = items
          .iter()
          .any(|item| item.label.eq_ignore_ascii_case(query));
        if !exact && !query.is_empty() {
          items.insert(0, LookupItem::new_entry(query));
        }
        self.state = if items.is_empty() {
          MenuState::NoResults
        } else {
          MenuState::Results
        };
        self.items = items;
      },
    }
    true
  }
}

/// An entry in an [`IndexedLookup`].
#[derive(Debug, Clone)]
pub struct IndexEntry {
  pub label:    Tendril,
  /// Lowercased alternative names and description text the query is also
  /// matched against.
  pub keywords: String,
  pub payload:  Value,
}

impl IndexEntry {
  pub fn new(label: impl Into<Tendril>) -> Self {
    Self {
      label:    label.into(),
      keywords: String::new(),
      payload:  Value::Null,
    }
  }

  pub fn with_keywords(mut self, keywords: &str) -> Self {
    self.keywords = keywords.to_lowercase();
    self
  }

  pub fn with_payload(mut self, payload: Value) -> Self {
    self.payload = payload;
    self
  }
}

/// A local lookup service over a prebuilt index: each entry matches when
/// the query occurs in its label or keywords. Useful when the candidate
/// set is known up front (template parameters, existing categories) and no
/// round-trip is needed.
#[derive(Debug, Clone, Default)]
pub struct IndexedLookup {
  entries: Vec<IndexEntry>,
}

impl IndexedLookup {
  pub fn new(entries: Vec<IndexEntry>) -> Self {
    Self { entries }
  }

  pub fn push(&mut self, entry: IndexEntry) {
    self.entries.push(entry);
  }
}

impl LookupService for IndexedLookup {
  fn fetch(&mut self, query: &str, abort: &AbortHandle) -> Result<Vec<LookupItem>> {
    let needle = query.trim().to_lowercase();
    let mut items = Vec::new();

    for entry in &self.entries {
      if abort.is_aborted() {
        break;
      }
      if entry.label.to_lowercase().contains(&needle) || entry.keywords.contains(&needle) {
        items.push(
          LookupItem::existing(entry.label.clone()).with_payload(entry.payload.clone()),
        );
      }
    }
    Ok(items)
  }
}

/// Debounced request driver: queued requests coalesce, the newest one is
/// fetched on flush and its outcome forwarded with its generation.
pub struct LookupHook<S: LookupService> {
  service:   S,
  window:    Duration,
  pending:   Option<LookupRequest>,
  responses: Sender<(u64, Result<Vec<LookupItem>>)>,
}

impl<S: LookupService> LookupHook<S> {
  pub fn new(service: S, window: Duration, responses: Sender<(u64, Result<Vec<LookupItem>>)>) -> Self {
    Self {
      service,
      window,
      pending: None,
      responses,
    }
  }
}

impl<S: LookupService> DebouncedHook for LookupHook<S> {
  type Event = LookupRequest;

  fn handle_event(&mut self, request: LookupRequest, _deadline: Option<Instant>) -> Option<Instant> {
    self.pending = Some(request);
    Some(Instant::now() + self.window)
  }

  fn flush(&mut self) {
    let Some(request) = self.pending.take() else {
      return;
    };
    if request.abort.is_aborted() {
      debug!("skipping aborted lookup request");
      return;
    }

    let result = self.service.fetch(&request.query, &request.abort);

    // The query may have moved on while the service was working.
    if request.abort.is_aborted() {
      debug!("dropping result of aborted lookup request");
      return;
    }
    if self.responses.try_send((request.generation, result)).is_err() {
      debug!("lookup response receiver is gone");
    }
  }
}
