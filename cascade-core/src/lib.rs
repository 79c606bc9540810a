//! Cascade Core
//!
//! This crate keeps a tree of UI consumers in sync with a single shared
//! store. It implements:
//!
//! - Hierarchical subscriptions with strictly top-down delivery
//! - Copy-on-write listener sets that tolerate mutation mid-notification
//! - A memoized derived-props pipeline per consumer
//! - Consumer lifecycle hooks for a host renderer
//!
//! # Architecture
//!
//! - `subscription`: listener sets and the subscription tree
//! - `store`: the [`Store`] interface and a reducer-driven [`BasicStore`]
//! - `selector`: props values, mapping stages and the memoized pipeline
//! - `connect`: connectors, contexts and mounted consumer nodes
//! - `host`: the [`RenderHost`] interface and a [`RenderQueue`]
//!
//! Only the root of each subscription tree listens to the store. Every other
//! node listens to its nearest connected ancestor, which forwards a
//! notification only after it has rendered for it. A descendant therefore
//! never derives props from state its ancestor has not rendered yet.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use cascade_core::connect::{connect, ConsumerNode, Provider};
//! use cascade_core::host::RenderQueue;
//! use cascade_core::selector::{MapToProps, Props, Value};
//! use cascade_core::store::{BasicStore, Store};
//!
//! let store = Arc::new(BasicStore::new(0i64, |count: &i64, delta: &i64| count + delta));
//! let queue = Arc::new(RenderQueue::new());
//!
//! let connector = connect::<BasicStore<i64, i64>>("Counter")
//!     .map_state(MapToProps::unary(|count: &i64| Props::from([("count", *count)]).into()))
//!     .build()
//!     .unwrap();
//!
//! let ctx = Provider::new(Arc::clone(&store)).context();
//! let node = ConsumerNode::mount(connector, queue.clone(), &ctx, Props::new()).unwrap();
//! node.render().unwrap();
//! node.did_mount();
//!
//! store.dispatch(1);
//! assert_eq!(queue.pop(), Some(node.id()));
//! assert_eq!(node.render().unwrap().get("count"), Some(&Value::Int(1)));
//! node.did_update();
//! ```

pub mod connect;
pub mod error;
pub mod host;
pub mod selector;
pub mod store;
pub mod subscription;

pub use connect::{connect, ConnectContext, ConnectOptions, Connector, ConsumerNode, Provider};
pub use error::{BoxError, Error, Result};
pub use host::{RenderHost, RenderQueue};
pub use selector::{DerivedSelector, MapToProps, Props, Value};
pub use store::{BasicStore, Dispatch, Store};
pub use subscription::{ListenerSet, NodeId, SubscriptionNode};
