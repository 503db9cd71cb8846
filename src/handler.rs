//! Handler registry for dispatching parsed events.
//!
//! The registry is per-instance and append-only: every [`EventKind`] is
//! pre-declared with an empty list at construction, and callbacks are only
//! ever appended, never removed or reordered. Dispatch snapshots the list
//! under a read lock, so a registration racing a dispatch is either fully
//! observed or not at all - it can never corrupt the list or skip an
//! unrelated entry.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use crate::event::{Event, EventKind};
use crate::prefix::Source;

/// Callback invoked for each occurrence of a subscribed event.
pub type Handler = Arc<dyn Fn(&Source, &Event) + Send + Sync>;

/// Append-only mapping from event kind to registered callbacks.
pub struct Registry {
    handlers: RwLock<HashMap<EventKind, Vec<Handler>>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create a registry with an empty list pre-declared for every kind.
    pub fn new() -> Self {
        let mut handlers = HashMap::new();
        for kind in EventKind::ALL {
            handlers.insert(kind, Vec::new());
        }
        Self {
            handlers: RwLock::new(handlers),
        }
    }

    /// Append a callback for an event kind and hand it back, so call sites
    /// can keep a reference to what they registered.
    pub fn register(&self, kind: EventKind, handler: Handler) -> Handler {
        self.handlers
            .write()
            .entry(kind)
            .or_default()
            .push(handler.clone());
        handler
    }

    /// Invoke every callback registered for the event, in registration
    /// order, on the caller's thread.
    ///
    /// A panicking callback is caught and logged; the remaining callbacks
    /// for the event still run.
    pub fn dispatch(&self, source: &Source, event: &Event) {
        let snapshot: Vec<Handler> = self
            .handlers
            .read()
            .get(&event.kind())
            .cloned()
            .unwrap_or_default();

        for handler in snapshot {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| handler(source, event))) {
                warn!(
                    kind = ?event.kind(),
                    panic = panic_message(payload.as_ref()),
                    "event handler panicked"
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
