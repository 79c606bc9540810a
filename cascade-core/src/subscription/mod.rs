//! Hierarchical Subscriptions
//!
//! This module implements the notification tree that sits between the store
//! and the consumer nodes.
//!
//! # Concepts
//!
//! ## Listener sets
//!
//! A [`ListenerSet`] is an ordered, double-buffered list of callbacks. A
//! notify pass iterates a snapshot, so listeners may subscribe, unsubscribe,
//! or tear down whole subtrees from inside a callback without disturbing the
//! pass in flight.
//!
//! ## Subscription nodes
//!
//! A [`SubscriptionNode`] is either a root, subscribed to the store, or a
//! child registered in its parent's listener set. A child is only ever woken
//! by its parent's `propagate`, which the owning consumer calls once its own
//! update is resolved. Delivery is therefore strictly top-down no matter how
//! deep or wide the tree is.

mod listener;
mod listeners;
mod node;

pub use listener::{Listener, ListenerId, Unsubscribe};
pub use listeners::ListenerSet;
pub use node::{NodeId, Subscribable, SubscriptionNode, SubscriptionState};
