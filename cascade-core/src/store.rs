//! Store interface and a reducer-driven implementation.
//!
//! The consumer tree only ever reads the store: it takes state snapshots,
//! subscribes the root of each subscription tree, and hands a [`Dispatch`]
//! handle to dispatch-stage mapping functions without interpreting it.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::subscription::{Listener, ListenerSet, Subscribable, Unsubscribe};

/// A single shared holder of application state.
///
/// `subscribe` comes from [`Subscribable`]: listeners are invoked with no
/// arguments after every state change.
pub trait Store: Subscribable + 'static {
    /// State snapshot type.
    type State: Send + Sync + 'static;
    /// Action type accepted by [`dispatch`](Store::dispatch).
    type Action: Send + 'static;

    /// Current state. Must be cheap; snapshots are shared, never copied.
    fn get_state(&self) -> Arc<Self::State>;

    /// Apply an action.
    fn dispatch(&self, action: Self::Action);
}

/// Cloneable dispatch handle passed to dispatch-stage mapping functions.
pub struct Dispatch<A> {
    send: Arc<dyn Fn(A) + Send + Sync>,
}

impl<A: Send + 'static> Dispatch<A> {
    /// Wrap an arbitrary dispatch function.
    pub fn new<F>(send: F) -> Self
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        Self {
            send: Arc::new(send),
        }
    }

    /// Dispatch handle for `store`.
    pub fn from_store<St>(store: Arc<St>) -> Self
    where
        St: Store<Action = A>,
    {
        Self::new(move |action| store.dispatch(action))
    }

    /// Send an action.
    pub fn dispatch(&self, action: A) {
        (self.send)(action);
    }

    /// Whether both handles wrap the same function.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.send, &other.send)
    }
}

impl<A> Clone for Dispatch<A> {
    fn clone(&self) -> Self {
        Self {
            send: Arc::clone(&self.send),
        }
    }
}

impl<A> fmt::Debug for Dispatch<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch").finish_non_exhaustive()
    }
}

type Reducer<S, A> = Box<dyn Fn(&S, &A) -> S + Send + Sync>;

/// In-memory store that folds actions through a reducer.
///
/// Every dispatch replaces the state snapshot and then notifies all
/// subscribers, whether or not the reducer changed anything. Dispatches are
/// serialized; a reducer must not call back into its own store.
pub struct BasicStore<S, A> {
    state: RwLock<Arc<S>>,
    reducer: Reducer<S, A>,
    listeners: ListenerSet,
    _action: PhantomData<fn(A)>,
}

impl<S, A> BasicStore<S, A>
where
    S: Send + Sync + 'static,
    A: Send + 'static,
{
    /// Create a store with an initial state and a reducer.
    pub fn new<R>(initial: S, reducer: R) -> Self
    where
        R: Fn(&S, &A) -> S + Send + Sync + 'static,
    {
        Self {
            state: RwLock::new(Arc::new(initial)),
            reducer: Box::new(reducer),
            listeners: ListenerSet::new(),
            _action: PhantomData,
        }
    }

    /// Number of direct subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }
}

impl<S, A> Subscribable for BasicStore<S, A>
where
    S: Send + Sync + 'static,
    A: Send + 'static,
{
    fn subscribe(&self, listener: Listener) -> Unsubscribe {
        self.listeners.add(listener)
    }
}

impl<S, A> Store for BasicStore<S, A>
where
    S: Send + Sync + 'static,
    A: Send + 'static,
{
    type State = S;
    type Action = A;

    fn get_state(&self) -> Arc<S> {
        Arc::clone(&self.state.read())
    }

    fn dispatch(&self, action: A) {
        // The reducer runs under the write lock so concurrent dispatches
        // never fold over the same snapshot. Listeners run after release.
        {
            let mut state = self.state.write();
            let next = (self.reducer)(&**state, &action);
            *state = Arc::new(next);
        }

        tracing::trace!(subscribers = self.listeners.len(), "store dispatched");
        self.listeners.notify();
    }
}

impl<S, A> fmt::Debug for BasicStore<S, A>
where
    S: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicStore")
            .field("state", &*self.state.read())
            .field("subscribers", &self.listeners.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
