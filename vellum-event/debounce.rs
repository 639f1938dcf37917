//! Debounced background hooks.
//!
//! A [`DebouncedHook`] runs as a background tokio task fed through an mpsc
//! channel. Each incoming event may extend or start a debounce deadline;
//! when the deadline passes without further events the hook flushes. This
//! is the machinery behind deferred work like lookup requests: keystrokes
//! stream in, one request goes out.

use std::time::Duration;

use futures_executor::block_on;
use tokio::{
  sync::mpsc::{
    self,
    Sender,
    error::TrySendError,
  },
  time::Instant,
};
use tracing::debug;

/// Maximum time to block when the channel is full. Kept very short: a
/// dropped debounced event is recoverable, a frozen surface is not.
const SEND_TIMEOUT_MS: u64 = 2;

pub trait DebouncedHook: Send + 'static + Sized {
  type Event: Send + 'static;

  /// Called for every event as it arrives. Returns the new debounce
  /// deadline, or `None` to flush on the next tick without waiting.
  /// `deadline` is the currently pending deadline, if any.
  fn handle_event(&mut self, event: Self::Event, deadline: Option<Instant>) -> Option<Instant>;

  /// Called when the debounce deadline is reached.
  fn flush(&mut self);

  /// Spawns the worker and returns its input channel. The worker is only
  /// spawned inside a tokio runtime so the hook types stay usable from
  /// plain unit tests.
  fn spawn(self) -> Sender<Self::Event> {
    let (tx, rx) = mpsc::channel(256);
    if tokio::runtime::Handle::try_current().is_ok() {
      tokio::spawn(run(self, rx));
    }
    tx
  }
}

async fn run<H: DebouncedHook>(mut hook: H, mut rx: mpsc::Receiver<H::Event>) {
  let mut deadline: Option<Instant> = None;
  loop {
    let event = match deadline {
      Some(at) => {
        match tokio::time::timeout_at(at, rx.recv()).await {
          Ok(event) => event,
          Err(_) => {
            hook.flush();
            deadline = None;
            continue;
          },
        }
      },
      None => rx.recv().await,
    };

    let Some(event) = event else {
      // All senders dropped; flush whatever is pending and stop.
      if deadline.is_some() {
        hook.flush();
      }
      return;
    };
    deadline = hook.handle_event(event, deadline);
  }
}

/// Sends an event to a hook without risking a stall: tries a non-blocking
/// send first and gives a full channel only a few milliseconds before
/// dropping the event.
pub fn send_hook_event<T: Send>(tx: &Sender<T>, event: T) {
  match tx.try_send(event) {
    Ok(()) => {},
    Err(TrySendError::Full(event)) => {
      let result = block_on(tx.send_timeout(event, Duration::from_millis(SEND_TIMEOUT_MS)));
      if result.is_err() {
        debug!("dropped debounced event after send timeout");
      }
    },
    Err(TrySendError::Closed(_)) => {
      debug!("dropped event for a stopped hook");
    },
  }
}

#[cfg(test)]
mod test {
  use std::sync::{
    Arc,
    atomic::{
      AtomicUsize,
      Ordering,
    },
  };

  use super::*;

  struct CountingHook {
    seen:    Arc<AtomicUsize>,
    flushes: Arc<AtomicUsize>,
    window:  Duration,
  }

  impl DebouncedHook for CountingHook {
    type Event = u32;

    fn handle_event(&mut self, _event: u32, _deadline: Option<Instant>) -> Option<Instant> {
      self.seen.fetch_add(1, Ordering::Relaxed);
      Some(Instant::now() + self.window)
    }

    fn flush(&mut self) {
      self.flushes.fetch_add(1, Ordering::Relaxed);
    }
  }

  #[tokio::test]
  async fn events_coalesce_into_one_flush() {
    let seen = Arc::new(AtomicUsize::new(0));
    let flushes = Arc::new(AtomicUsize::new(0));
    let hook = CountingHook {
      seen:    Arc::clone(&seen),
      flushes: Arc::clone(&flushes),
      window:  Duration::from_millis(10),
    };

    let tx = hook.spawn();
    for i in 0..5 {
      tx.send(i).await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(seen.load(Ordering::Relaxed), 5);
    assert_eq!(flushes.load(Ordering::Relaxed), 1);
  }

  #[test]
  fn spawn_outside_a_runtime_degrades_to_dropping_events() {
    let hook = CountingHook {
      seen:    Arc::new(AtomicUsize::new(0)),
      flushes: Arc::new(AtomicUsize::new(0)),
      window:  Duration::from_millis(1),
    };
    // No runtime: no worker is spawned and the receiver is gone, so sends
    // are silently dropped instead of blocking a unit test.
    let tx = hook.spawn();
    assert!(tx.is_closed());
    send_hook_event(&tx, 1);
  }
}
