//! Consumer Node
//!
//! A `ConsumerNode` is one mounted instance of a [`Connector`]: it owns a
//! [`DerivedSelector`] and, if it handles state changes, a
//! [`SubscriptionNode`] in the subscription tree.
//!
//! # Lifecycle
//!
//! The host drives a node through these calls:
//!
//! 1. [`mount`](ConsumerNode::mount): resolve the store, build the selector
//!    and run it against the initial props.
//!
//! 2. [`render`](ConsumerNode::render): hand out derived props.
//!
//! 3. [`did_mount`](ConsumerNode::did_mount): attach the subscription and
//!    re-run, in case the store changed between construction and commit.
//!
//! 4. [`receive_props`](ConsumerNode::receive_props) /
//!    [`render`](ConsumerNode::render) /
//!    [`did_update`](ConsumerNode::did_update), any number of times.
//!
//! 5. [`will_unmount`](ConsumerNode::will_unmount).
//!
//! # Notification
//!
//! When the store (or the parent subscription) notifies, the node re-runs
//! its selector. If nothing changed it forwards the notification to its
//! children immediately. If something changed it asks the host for a render
//! and holds the notification back until the host reports the commit through
//! `did_update`, so children never see state newer than their parent has
//! rendered.
//!
//! # Locking
//!
//! No lock is held while the host, a listener or a child runs. Mapping
//! functions run under the selector lock; a notification that arrives while
//! the selector is already running on this node is dropped.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::host::RenderHost;
use crate::selector::{DerivedSelector, Props};
use crate::store::Store;
use crate::subscription::{Listener, NodeId, Subscribable, SubscriptionNode};

use super::connector::Connector;
use super::context::{ConnectContext, ExplicitStore};

/// Where a node got its store from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChannel {
    /// From the ambient [`ConnectContext`].
    Ambient,
    /// From an [`ExplicitStore`].
    Explicit,
}

/// What happens to the next store notification's propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyState {
    /// Propagation is immediate.
    Idle,
    /// A render was requested; propagate from `did_update`.
    PendingNotify,
    /// Everything is a no-op. Terminal.
    Unmounted,
}

/// One mounted consumer.
pub struct ConsumerNode<St: Store> {
    id: NodeId,
    connector: Arc<Connector<St>>,
    store: Arc<St>,
    host: Arc<dyn RenderHost>,
    channel: StoreChannel,
    /// Context received from ancestors.
    ambient: ConnectContext<St>,
    subscription: Option<Arc<SubscriptionNode>>,
    selector: Mutex<DerivedSelector<St>>,
    own_props: Mutex<Props>,
    notify: Mutex<NotifyState>,
    render_count: AtomicU64,
}

impl<St: Store> ConsumerNode<St> {
    /// Mount a node that finds its store through the ambient context.
    ///
    /// Fails with [`Error::MissingStore`] when no provider is above it.
    pub fn mount(
        connector: Arc<Connector<St>>,
        host: Arc<dyn RenderHost>,
        ctx: &ConnectContext<St>,
        props: Props,
    ) -> Result<Arc<Self>> {
        let store = match ctx.store() {
            Some(store) => Arc::clone(store),
            None => {
                return Err(Error::MissingStore {
                    display_name: connector.display_name().to_owned(),
                    store_key: connector.options().store_key.clone(),
                })
            }
        };
        let parent = ctx.subscription_link();
        Ok(Self::build(
            connector,
            host,
            ctx.clone(),
            StoreChannel::Ambient,
            store,
            parent,
            props,
        ))
    }

    /// Mount a node with an explicitly supplied store.
    ///
    /// `ctx` is still passed through to descendants untouched.
    pub fn mount_explicit(
        connector: Arc<Connector<St>>,
        host: Arc<dyn RenderHost>,
        ctx: &ConnectContext<St>,
        explicit: ExplicitStore<St>,
        props: Props,
    ) -> Arc<Self> {
        let (store, parent) = explicit.into_parts();
        Self::build(
            connector,
            host,
            ctx.clone(),
            StoreChannel::Explicit,
            store,
            parent,
            props,
        )
    }

    fn build(
        connector: Arc<Connector<St>>,
        host: Arc<dyn RenderHost>,
        ambient: ConnectContext<St>,
        channel: StoreChannel,
        store: Arc<St>,
        parent: Option<Weak<SubscriptionNode>>,
        props: Props,
    ) -> Arc<Self> {
        let id = NodeId::new();
        let mut selector = connector.make_selector(Arc::clone(&store));
        selector.run(&props);

        tracing::debug!(
            node = %id,
            display_name = connector.display_name(),
            channel = ?channel,
            "consumer mounted"
        );

        Arc::new_cyclic(|weak: &Weak<Self>| {
            let subscription = connector.handles_state_changes().then(|| {
                let weak = weak.clone();
                let on_notify: Listener = Arc::new(move || {
                    if let Some(node) = weak.upgrade() {
                        node.on_state_change();
                    }
                });
                let source: Arc<dyn Subscribable> = Arc::clone(&store) as Arc<dyn Subscribable>;
                Arc::new(SubscriptionNode::new(id, source, parent, on_notify))
            });

            Self {
                id,
                connector,
                store,
                host,
                channel,
                ambient,
                subscription,
                selector: Mutex::new(selector),
                own_props: Mutex::new(props),
                notify: Mutex::new(NotifyState::Idle),
                render_count: AtomicU64::new(0),
            }
        })
    }

    /// Post-commit hook for the first render: attach, then catch up.
    pub fn did_mount(&self) {
        let Some(subscription) = &self.subscription else {
            return;
        };
        if self.notify_state() == NotifyState::Unmounted {
            return;
        }
        subscription.attach();

        if self.run_selector() == Some(true) {
            self.host.request_render(self.id);
        }
    }

    /// New own props from the parent. Returns whether a render is owed.
    pub fn receive_props(&self, props: Props) -> bool {
        if self.notify_state() == NotifyState::Unmounted {
            return false;
        }
        *self.own_props.lock() = props;
        self.run_selector().unwrap_or(false)
    }

    /// Whether a render is owed since the last one.
    pub fn should_update(&self) -> bool {
        self.selector.lock().should_update()
    }

    /// Produce render output and clear the pending-render flag.
    ///
    /// Returns the selector's captured error instead, if it holds one.
    pub fn render(&self) -> Result<Props> {
        let mut props = {
            let mut selector = self.selector.lock();
            selector.take_should_update();
            if let Some(err) = selector.error() {
                return Err(err.clone());
            }
            selector.props().cloned().unwrap_or_default()
        };

        let count = self.render_count.fetch_add(1, Ordering::Relaxed);
        if let Some(key) = &self.connector.options().render_count_prop {
            props.insert(key.as_str(), count as i64);
        }
        Ok(props)
    }

    /// Post-commit hook for every later render. Releases a held-back
    /// notification.
    pub fn did_update(&self) {
        let pending = {
            let mut notify = self.notify.lock();
            if *notify == NotifyState::PendingNotify {
                *notify = NotifyState::Idle;
                true
            } else {
                false
            }
        };
        if pending {
            self.notify_nested();
        }
    }

    /// Detach and go inert. Idempotent.
    pub fn will_unmount(&self) {
        {
            let mut notify = self.notify.lock();
            if *notify == NotifyState::Unmounted {
                return;
            }
            *notify = NotifyState::Unmounted;
        }
        if let Some(subscription) = &self.subscription {
            subscription.detach();
        }
        self.selector.lock().retire();

        tracing::debug!(
            node = %self.id,
            display_name = self.connector.display_name(),
            "consumer unmounted"
        );
    }

    fn on_state_change(&self) {
        if self.notify_state() == NotifyState::Unmounted {
            return;
        }
        let Some(should_update) = self.run_selector() else {
            return;
        };

        if !should_update {
            self.notify_nested();
            return;
        }
        {
            let mut notify = self.notify.lock();
            if *notify == NotifyState::Unmounted {
                return;
            }
            *notify = NotifyState::PendingNotify;
        }
        self.host.request_render(self.id);
    }

    /// Forward a notification to child subscriptions.
    pub fn notify_nested(&self) {
        if let Some(subscription) = &self.subscription {
            subscription.propagate();
        }
    }

    /// Run the selector against current own props. `None` if it is already
    /// running further up the stack.
    fn run_selector(&self) -> Option<bool> {
        let own_props = self.own_props.lock().clone();
        let Some(mut selector) = self.selector.try_lock() else {
            tracing::warn!(
                node = %self.id,
                display_name = self.connector.display_name(),
                "re-entrant selector run skipped; mapping functions must not dispatch"
            );
            return None;
        };
        selector.run(&own_props);
        tracing::trace!(node = %self.id, changed = selector.changed(), "selector ran");
        Some(selector.should_update())
    }

    /// Whether this node listens for state changes right now.
    pub fn is_subscribed(&self) -> bool {
        self.connector.handles_state_changes()
            && self
                .subscription
                .as_ref()
                .is_some_and(|subscription| subscription.is_subscribed())
    }

    /// Context to hand to ambient-mode children.
    pub fn child_context(&self) -> ConnectContext<St> {
        match self.channel {
            StoreChannel::Explicit => self.ambient.clone(),
            StoreChannel::Ambient => {
                let own = self.subscription.as_ref().map(Arc::downgrade);
                self.ambient
                    .with_subscription(own.or_else(|| self.ambient.subscription_link()))
            }
        }
    }

    /// Subscription to hand to explicit-mode children.
    ///
    /// Only explicit-mode nodes expose one.
    pub fn explicit_subscription(&self) -> Option<Arc<SubscriptionNode>> {
        match self.channel {
            StoreChannel::Explicit => self.subscription.clone(),
            StoreChannel::Ambient => None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn display_name(&self) -> &str {
        self.connector.display_name()
    }

    pub fn connector(&self) -> &Arc<Connector<St>> {
        &self.connector
    }

    pub fn store(&self) -> &Arc<St> {
        &self.store
    }

    pub fn channel(&self) -> StoreChannel {
        self.channel
    }

    pub fn subscription(&self) -> Option<&Arc<SubscriptionNode>> {
        self.subscription.as_ref()
    }

    pub fn own_props(&self) -> Props {
        self.own_props.lock().clone()
    }

    /// Last successfully derived props, without render extras.
    pub fn derived_props(&self) -> Option<Props> {
        self.selector.lock().props().cloned()
    }

    /// Whether the most recent selector run changed anything.
    pub fn last_run_changed(&self) -> bool {
        self.selector.lock().changed()
    }

    pub fn notify_state(&self) -> NotifyState {
        *self.notify.lock()
    }

    /// Renders produced so far.
    pub fn render_count(&self) -> u64 {
        self.render_count.load(Ordering::Relaxed)
    }
}

impl<St: Store> Drop for ConsumerNode<St> {
    fn drop(&mut self) {
        // Explicit-mode children may still hold the subscription.
        self.will_unmount();
    }
}

impl<St: Store> fmt::Debug for ConsumerNode<St> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerNode")
            .field("id", &self.id)
            .field("display_name", &self.display_name())
            .field("channel", &self.channel)
            .field("notify", &self.notify_state())
            .field("subscription", &self.subscription)
            .field("render_count", &self.render_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connect::{connect, ConnectOptions, Provider};
    use crate::host::RenderQueue;
    use crate::selector::{MapToProps, Value};
    use crate::store::BasicStore;
    use crate::subscription::SubscriptionState;

    type Counter = BasicStore<i64, i64>;

    fn counter() -> Arc<Counter> {
        Arc::new(BasicStore::new(0, |count: &i64, delta: &i64| count + delta))
    }

    fn count_connector() -> Arc<Connector<Counter>> {
        connect::<Counter>("Count")
            .map_state(MapToProps::unary(|count: &i64| Props::from([("count", *count)]).into()))
            .build()
            .unwrap()
    }

    fn mounted(
        store: &Arc<Counter>,
        queue: &Arc<RenderQueue>,
        connector: Arc<Connector<Counter>>,
    ) -> Arc<ConsumerNode<Counter>> {
        let ctx = Provider::new(Arc::clone(store)).context();
        let node = ConsumerNode::mount(connector, queue.clone(), &ctx, Props::new()).unwrap();
        node.render().unwrap();
        node.did_mount();
        node
    }

    #[test]
    fn mount_without_store_fails() {
        let queue = Arc::new(RenderQueue::new());
        let err = ConsumerNode::mount(
            count_connector(),
            queue,
            &ConnectContext::empty(),
            Props::new(),
        )
        .unwrap_err();

        match err {
            Error::MissingStore {
                display_name,
                store_key,
            } => {
                assert_eq!(display_name, "Connect(Count)");
                assert_eq!(store_key, "store");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn did_mount_subscribes_and_render_clears_flag() {
        let store = counter();
        let queue = Arc::new(RenderQueue::new());
        let ctx = Provider::new(Arc::clone(&store)).context();
        let node = ConsumerNode::mount(count_connector(), queue.clone(), &ctx, Props::new()).unwrap();

        assert!(!node.is_subscribed());
        assert!(node.should_update());
        let props = node.render().unwrap();
        assert_eq!(props.get("count"), Some(&Value::Int(0)));
        assert!(!node.should_update());

        node.did_mount();
        assert!(node.is_subscribed());
        assert!(queue.is_empty());
        assert_eq!(store.subscriber_count(), 1);
    }

    #[test]
    fn changed_state_defers_propagation_until_did_update() {
        let store = counter();
        let queue = Arc::new(RenderQueue::new());
        let node = mounted(&store, &queue, count_connector());

        store.dispatch(1);
        assert_eq!(queue.pop(), Some(node.id()));
        assert_eq!(node.notify_state(), NotifyState::PendingNotify);

        let props = node.render().unwrap();
        assert_eq!(props.get("count"), Some(&Value::Int(1)));
        node.did_update();
        assert_eq!(node.notify_state(), NotifyState::Idle);
    }

    #[test]
    fn unchanged_state_requests_no_render() {
        let store = counter();
        let queue = Arc::new(RenderQueue::new());
        let node = mounted(&store, &queue, count_connector());

        store.dispatch(0);
        assert!(queue.is_empty());
        assert_eq!(node.notify_state(), NotifyState::Idle);
        assert!(!node.last_run_changed());
    }

    #[test]
    fn node_without_state_stage_never_subscribes() {
        let store = counter();
        let queue = Arc::new(RenderQueue::new());
        let connector = connect::<Counter>("Static").build().unwrap();
        let node = mounted(&store, &queue, connector);

        assert!(node.subscription().is_none());
        assert!(!node.is_subscribed());
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn receive_props_reports_whether_render_is_owed() {
        let store = counter();
        let queue = Arc::new(RenderQueue::new());
        let node = mounted(&store, &queue, count_connector());

        assert!(node.receive_props(Props::from([("label", "a")])));
        node.render().unwrap();
        // Shallow-equal props: nothing to do.
        assert!(!node.receive_props(Props::from([("label", "a")])));
    }

    #[test]
    fn render_count_prop_is_added() {
        let store = counter();
        let queue = Arc::new(RenderQueue::new());
        let connector = connect::<Counter>("Count")
            .options(ConnectOptions {
                render_count_prop: Some("renders".into()),
                ..ConnectOptions::default()
            })
            .build()
            .unwrap();
        let node = mounted(&store, &queue, connector);

        let props = node.render().unwrap();
        assert_eq!(props.get("renders"), Some(&Value::Int(1)));
        assert_eq!(node.render_count(), 2);
        // Extras never leak into the derived props.
        assert!(!node.derived_props().unwrap().contains_key("renders"));
    }

    #[test]
    fn unmount_detaches_and_silences() {
        let store = counter();
        let queue = Arc::new(RenderQueue::new());
        let node = mounted(&store, &queue, count_connector());

        node.will_unmount();
        assert_eq!(node.notify_state(), NotifyState::Unmounted);
        assert_eq!(
            node.subscription().map(|s| s.state()),
            Some(SubscriptionState::Detached)
        );
        assert_eq!(store.subscriber_count(), 0);

        store.dispatch(3);
        assert!(queue.is_empty());
        assert!(!node.receive_props(Props::from([("x", 1)])));
        node.will_unmount();
    }

    #[test]
    fn dropping_mounted_nodes_leaves_store() {
        let store = counter();
        let queue = Arc::new(RenderQueue::new());
        let nodes: Vec<_> = (0..100)
            .map(|_| mounted(&store, &queue, count_connector()))
            .collect();
        assert_eq!(store.subscriber_count(), 100);

        let child_ctx = nodes[0].child_context();
        let held = nodes[1].explicit_subscription().unwrap();
        drop(nodes);
        assert_eq!(store.subscriber_count(), 0);
        assert!(child_ctx.subscription().is_none());
        assert!(!held.is_subscribed());

        store.dispatch(1);
        assert!(queue.is_empty());
    }

    #[test]
    fn ambient_child_context_shadows_subscription() {
        let store = counter();
        let queue = Arc::new(RenderQueue::new());
        let node = mounted(&store, &queue, count_connector());

        let child_ctx = node.child_context();
        let sub = child_ctx.subscription().unwrap();
        assert!(Arc::ptr_eq(&sub, node.subscription().unwrap()));
        assert!(node.explicit_subscription().is_none());
    }

    #[test]
    fn explicit_node_passes_context_through() {
        let store = counter();
        let queue = Arc::new(RenderQueue::new());
        let ctx = ConnectContext::empty();
        let node = ConsumerNode::mount_explicit(
            count_connector(),
            queue,
            &ctx,
            ExplicitStore::new(Arc::clone(&store)),
            Props::new(),
        );
        node.render().unwrap();
        node.did_mount();

        assert_eq!(node.channel(), StoreChannel::Explicit);
        assert!(node.child_context().store().is_none());
        assert!(node.child_context().subscription().is_none());
        assert!(node.explicit_subscription().is_some());
        assert!(node.is_subscribed());
    }
}
