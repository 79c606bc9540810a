//! Store and subscription lookup for descendants.
//!
//! There are two ways for a node to find its store and its parent
//! subscription, and a node uses exactly one of them:
//!
//! - the ambient [`ConnectContext`], seeded by a [`Provider`] and refined by
//!   each ambient-mode node, which shadows the subscription with its own;
//! - an [`ExplicitStore`] handed to the node directly, optionally carrying
//!   the subscription of an explicit-mode ancestor.
//!
//! Contexts hold subscriptions weakly. A context outliving the node that
//! produced it simply stops yielding a parent.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::store::Store;
use crate::subscription::SubscriptionNode;

/// What a node sees from its ancestors through the ambient channel.
pub struct ConnectContext<St: Store> {
    store: Option<Arc<St>>,
    subscription: Option<Weak<SubscriptionNode>>,
}

impl<St: Store> ConnectContext<St> {
    /// Context with neither store nor subscription, as seen outside any
    /// provider.
    pub fn empty() -> Self {
        Self {
            store: None,
            subscription: None,
        }
    }

    pub fn store(&self) -> Option<&Arc<St>> {
        self.store.as_ref()
    }

    /// Nearest enclosing subscription, if it is still alive.
    pub fn subscription(&self) -> Option<Arc<SubscriptionNode>> {
        self.subscription.as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn subscription_link(&self) -> Option<Weak<SubscriptionNode>> {
        self.subscription.clone()
    }

    /// Same store, with `subscription` as the nearest enclosing one.
    pub(crate) fn with_subscription(&self, subscription: Option<Weak<SubscriptionNode>>) -> Self {
        Self {
            store: self.store.clone(),
            subscription,
        }
    }
}

impl<St: Store> Clone for ConnectContext<St> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            subscription: self.subscription.clone(),
        }
    }
}

impl<St: Store> Default for ConnectContext<St> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<St: Store> fmt::Debug for ConnectContext<St> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectContext")
            .field("has_store", &self.store.is_some())
            .field("has_subscription", &self.subscription().is_some())
            .finish()
    }
}

/// Root of a consumer tree: makes a store available to the ambient channel.
pub struct Provider<St: Store> {
    store: Arc<St>,
}

impl<St: Store> Provider<St> {
    pub fn new(store: Arc<St>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<St> {
        &self.store
    }

    /// Context for the provider's direct children.
    pub fn context(&self) -> ConnectContext<St> {
        ConnectContext {
            store: Some(Arc::clone(&self.store)),
            subscription: None,
        }
    }
}

/// A store passed to a node directly instead of through the context.
pub struct ExplicitStore<St: Store> {
    store: Arc<St>,
    subscription: Option<Weak<SubscriptionNode>>,
}

impl<St: Store> ExplicitStore<St> {
    /// Explicit store with no parent subscription; the node becomes a root.
    pub fn new(store: Arc<St>) -> Self {
        Self {
            store,
            subscription: None,
        }
    }

    /// Nest under `subscription`, typically an explicit-mode ancestor's
    /// [`explicit_subscription`](super::ConsumerNode::explicit_subscription).
    pub fn with_subscription(mut self, subscription: Option<Arc<SubscriptionNode>>) -> Self {
        self.subscription = subscription.as_ref().map(Arc::downgrade);
        self
    }

    pub fn store(&self) -> &Arc<St> {
        &self.store
    }

    pub(crate) fn into_parts(self) -> (Arc<St>, Option<Weak<SubscriptionNode>>) {
        (self.store, self.subscription)
    }
}

impl<St: Store> Clone for ExplicitStore<St> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            subscription: self.subscription.clone(),
        }
    }
}

impl<St: Store> fmt::Debug for ExplicitStore<St> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExplicitStore")
            .field("has_subscription", &self.subscription.is_some())
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
