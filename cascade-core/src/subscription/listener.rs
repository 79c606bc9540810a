//! Listener handles and the idempotent unsubscribe token.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Callback invoked with no arguments whenever a source notifies.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Unique identifier for a registered listener.
///
/// The same closure may be registered twice; each registration gets its own
/// ID so removal takes out exactly the entry it was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Generate a new unique listener ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Token returned by every `subscribe`/`add` call.
///
/// Calling [`unsubscribe`](Self::unsubscribe) runs the removal once; later
/// calls are no-ops. Dropping the token does **not** unsubscribe.
pub struct Unsubscribe {
    remove: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Unsubscribe {
    /// Wrap a removal closure.
    pub fn new<F>(remove: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            remove: Mutex::new(Some(Box::new(remove))),
        }
    }

    /// A token with nothing to remove.
    pub fn noop() -> Self {
        Self {
            remove: Mutex::new(None),
        }
    }

    /// Remove the registration. Idempotent.
    pub fn unsubscribe(&self) {
        // Take the closure out before running it so a removal that
        // re-enters this token sees it already spent.
        let remove = self.remove.lock().take();
        if let Some(remove) = remove {
            remove();
        }
    }

    /// Whether the removal has not run yet.
    pub fn is_pending(&self) -> bool {
        self.remove.lock().is_some()
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("pending", &self.is_pending())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
