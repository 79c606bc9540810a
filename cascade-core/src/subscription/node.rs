//! Subscription tree nodes.
//!
//! A [`SubscriptionNode`] either subscribes to the store directly (a root)
//! or registers into its parent's [`ListenerSet`]. Only roots ever hear from
//! the store; every other node is woken by its parent's
//! [`propagate`](SubscriptionNode::propagate), which the parent calls only
//! after resolving its own update. That delegation is what makes delivery
//! top-down.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::listener::{Listener, Unsubscribe};
use super::listeners::ListenerSet;

/// Unique identifier for a node in the consumer tree.
///
/// Shared by a [`ConsumerNode`](crate::connect::ConsumerNode) and the
/// subscription it owns, and used by hosts to address render requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Anything a root subscription can listen to.
///
/// Every [`Store`](crate::store::Store) is subscribable; the trait is split
/// out so subscription nodes stay independent of the state type.
pub trait Subscribable: Send + Sync {
    /// Register `listener`, returning the token that removes it.
    fn subscribe(&self, listener: Listener) -> Unsubscribe;
}

/// Lifecycle of a subscription node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Created but not yet listening.
    Unattached,
    /// Listening to the parent or the store.
    Attached,
    /// Torn down. Terminal.
    Detached,
}

enum Slot {
    Unattached,
    Attached {
        unsubscribe: Unsubscribe,
        listeners: ListenerSet,
    },
    Detached,
}

impl Slot {
    fn state(&self) -> SubscriptionState {
        match self {
            Slot::Unattached => SubscriptionState::Unattached,
            Slot::Attached { .. } => SubscriptionState::Attached,
            Slot::Detached => SubscriptionState::Detached,
        }
    }
}

/// A node in the subscription tree.
pub struct SubscriptionNode {
    id: NodeId,
    store: Arc<dyn Subscribable>,
    /// Non-owning link to the nearest enclosing subscription.
    parent: Option<Weak<SubscriptionNode>>,
    on_notify: Listener,
    slot: Mutex<Slot>,
}

impl SubscriptionNode {
    /// Create an unattached node.
    ///
    /// With `parent == None` the node will subscribe to `store` directly
    /// once attached.
    pub fn new(
        id: NodeId,
        store: Arc<dyn Subscribable>,
        parent: Option<Weak<SubscriptionNode>>,
        on_notify: Listener,
    ) -> Self {
        Self {
            id,
            store,
            parent,
            on_notify,
            slot: Mutex::new(Slot::Unattached),
        }
    }

    /// Owner's node ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Whether this node listens to a parent rather than the store.
    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SubscriptionState {
        self.slot.lock().state()
    }

    /// Whether the node is attached.
    pub fn is_subscribed(&self) -> bool {
        self.state() == SubscriptionState::Attached
    }

    /// Start listening. No-op unless unattached.
    ///
    /// The node's own listener set is created here, not at construction, so
    /// an unattached node never accepts nested listeners.
    pub fn attach(&self) {
        let mut slot = self.slot.lock();
        if !matches!(*slot, Slot::Unattached) {
            return;
        }

        let unsubscribe = match &self.parent {
            None => self.store.subscribe(Arc::clone(&self.on_notify)),
            Some(parent) => match parent.upgrade() {
                Some(parent) => parent.add_nested(Arc::clone(&self.on_notify)),
                None => {
                    tracing::warn!(node = %self.id, "parent subscription is gone; staying unattached");
                    return;
                }
            },
        };

        tracing::debug!(node = %self.id, root = self.parent.is_none(), "subscription attached");
        *slot = Slot::Attached {
            unsubscribe,
            listeners: ListenerSet::new(),
        };
    }

    /// Register a child listener, attaching this node first if needed.
    ///
    /// Hosts mount children before parents, so a child attaching at mount
    /// time is usually what attaches its parent.
    pub fn add_nested(&self, listener: Listener) -> Unsubscribe {
        self.attach();
        let listeners = match &*self.slot.lock() {
            Slot::Attached { listeners, .. } => listeners.clone(),
            _ => return Unsubscribe::noop(),
        };
        listeners.add(listener)
    }

    /// Notify child listeners. No-op unless attached.
    pub fn propagate(&self) {
        let listeners = match &*self.slot.lock() {
            Slot::Attached { listeners, .. } => listeners.clone(),
            _ => return,
        };
        listeners.notify();
    }

    /// Stop listening and drop all child listeners. No-op unless attached.
    pub fn detach(&self) {
        let previous = {
            let mut slot = self.slot.lock();
            if !matches!(*slot, Slot::Attached { .. }) {
                return;
            }
            std::mem::replace(&mut *slot, Slot::Detached)
        };

        if let Slot::Attached {
            unsubscribe,
            listeners,
        } = previous
        {
            unsubscribe.unsubscribe();
            listeners.clear();
            tracing::debug!(node = %self.id, "subscription detached");
        }
    }

    /// Number of child listeners currently registered.
    pub fn nested_count(&self) -> usize {
        match &*self.slot.lock() {
            Slot::Attached { listeners, .. } => listeners.len(),
            _ => 0,
        }
    }
}

impl Drop for SubscriptionNode {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for SubscriptionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionNode")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("has_parent", &self.has_parent())
            .field("nested_count", &self.nested_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
