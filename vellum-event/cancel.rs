//! Cooperative cancellation for in-flight requests.
//!
//! An [`AbortHandle`] belongs to exactly one request. Aborting is
//! idempotent, observable from every clone of the handle, and affects
//! nothing but that request - a newer request gets a fresh handle.

use std::sync::{
  Arc,
  atomic::{
    AtomicBool,
    Ordering,
  },
};

#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
  aborted: Arc<AtomicBool>,
}

impl AbortHandle {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn abort(&self) {
    self.aborted.store(true, Ordering::Relaxed);
  }

  pub fn is_aborted(&self) -> bool {
    self.aborted.load(Ordering::Relaxed)
  }
}
