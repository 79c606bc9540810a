//! Double-buffered listener collection.
//!
//! A [`ListenerSet`] keeps two references to its entries: `current`, the
//! snapshot the last (possibly still running) notify pass iterates, and
//! `next`, the live list that `add` and removal edit. Both start out pointing
//! at the same buffer. The first structural change after a notify forks
//! `next` away from the snapshot via [`Arc::make_mut`], so a pass that is
//! already iterating never sees the change.
//!
//! Consequences callers rely on:
//!
//! - a listener added during a pass is first called on the *next* pass;
//! - a listener removed during a pass may still be called once by that pass
//!   if it was already snapshotted, and never again afterwards;
//! - once [`clear`](ListenerSet::clear)ed, the set stays defunct.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::listener::{Listener, ListenerId, Unsubscribe};

type Entries = SmallVec<[(ListenerId, Listener); 4]>;

struct Buffers {
    /// Snapshot handed to the most recent notify pass. `None` once cleared.
    current: Option<Arc<Entries>>,
    /// Live list. `None` once cleared.
    next: Option<Arc<Entries>>,
}

impl Buffers {
    fn is_cleared(&self) -> bool {
        self.next.is_none()
    }
}

/// Ordered set of listeners that is safe to mutate while notifying.
///
/// Cloning yields another handle to the same set.
#[derive(Clone)]
pub struct ListenerSet {
    buffers: Arc<Mutex<Buffers>>,
}

impl ListenerSet {
    /// Create an empty, live set.
    pub fn new() -> Self {
        let empty = Arc::new(Entries::new());
        Self {
            buffers: Arc::new(Mutex::new(Buffers {
                current: Some(Arc::clone(&empty)),
                next: Some(empty),
            })),
        }
    }

    /// Append a listener.
    ///
    /// Returns a token that removes exactly this registration. On a cleared
    /// set the listener is dropped and the token does nothing.
    pub fn add(&self, listener: Listener) -> Unsubscribe {
        let id = ListenerId::new();
        {
            let mut buffers = self.buffers.lock();
            let Some(next) = buffers.next.as_mut() else {
                return Unsubscribe::noop();
            };
            Arc::make_mut(next).push((id, listener));
        }

        let weak: Weak<Mutex<Buffers>> = Arc::downgrade(&self.buffers);
        Unsubscribe::new(move || {
            if let Some(buffers) = weak.upgrade() {
                Self::remove_entry(&buffers, id);
            }
        })
    }

    fn remove_entry(buffers: &Mutex<Buffers>, id: ListenerId) {
        let mut buffers = buffers.lock();
        let Some(next) = buffers.next.as_mut() else {
            return;
        };
        if let Some(pos) = next.iter().position(|(entry_id, _)| *entry_id == id) {
            Arc::make_mut(next).remove(pos);
        }
    }

    /// Invoke every listener registered at call time, in insertion order.
    ///
    /// No lock is held while listeners run.
    pub fn notify(&self) {
        let snapshot = {
            let mut buffers = self.buffers.lock();
            buffers.current = buffers.next.clone();
            buffers.current.clone()
        };

        let Some(snapshot) = snapshot else {
            return;
        };
        tracing::trace!(listeners = snapshot.len(), "notify pass");
        for (_, listener) in snapshot.iter() {
            listener();
        }
    }

    /// Permanently empty the set. Later `add` calls are no-ops.
    pub fn clear(&self) {
        let mut buffers = self.buffers.lock();
        buffers.current = None;
        buffers.next = None;
    }

    /// Whether [`clear`](Self::clear) has been called.
    pub fn is_cleared(&self) -> bool {
        self.buffers.lock().is_cleared()
    }

    /// Number of live listeners.
    pub fn len(&self) -> usize {
        self.buffers
            .lock()
            .next
            .as_ref()
            .map_or(0, |entries| entries.len())
    }

    /// Whether there are no live listeners.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the live list is currently shared with the last snapshot.
    pub fn is_aliased(&self) -> bool {
        let buffers = self.buffers.lock();
        match (&buffers.current, &buffers.next) {
            (Some(current), Some(next)) => Arc::ptr_eq(current, next),
            _ => false,
        }
    }
}

impl Default for ListenerSet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet")
            .field("len", &self.len())
            .field("cleared", &self.is_cleared())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
