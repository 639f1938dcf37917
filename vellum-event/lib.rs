pub mod cancel;
pub mod debounce;

pub use cancel::AbortHandle;
pub use debounce::{
  DebouncedHook,
  send_hook_event,
};
