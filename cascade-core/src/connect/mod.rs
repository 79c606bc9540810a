//! Connecting consumers to a store.
//!
//! - `options`: serializable [`ConnectOptions`]
//! - `connector`: the [`connect`] builder and frozen [`Connector`]
//! - `context`: [`Provider`], [`ConnectContext`] and [`ExplicitStore`]
//! - `consumer`: mounted [`ConsumerNode`]s

mod connector;
mod consumer;
mod context;
mod options;

pub use connector::{connect, ConnectBuilder, Connector};
pub use consumer::{ConsumerNode, NotifyState, StoreChannel};
pub use context::{ConnectContext, ExplicitStore, Provider};
pub use options::ConnectOptions;
