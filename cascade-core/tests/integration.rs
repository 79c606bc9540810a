//! Integration Tests for Consumer Trees
//!
//! These tests mount small consumer trees over a `BasicStore`, drive them
//! through a render loop the way a host renderer would, and check the
//! delivery order and render behavior that come out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use cascade_core::connect::{
    connect, ConnectContext, ConnectOptions, Connector, ConsumerNode, ExplicitStore, NotifyState,
    Provider,
};
use cascade_core::host::{RenderHost, RenderQueue};
use cascade_core::selector::{MapToProps, Props, Value};
use cascade_core::store::{BasicStore, Store};
use cascade_core::{Error, NodeId};

#[derive(Debug, Clone, Default)]
struct App {
    header: i64,
    body: i64,
    footer: i64,
    broken: bool,
}

#[derive(Debug, Clone, Copy)]
enum Msg {
    Header(i64),
    Body(i64),
    Footer(i64),
    All(i64),
    Break(bool),
    Touch,
}

type AppStore = BasicStore<App, Msg>;
type Node = Arc<ConsumerNode<AppStore>>;
type Hook = Arc<dyn Fn(NodeId) + Send + Sync>;

fn reduce(app: &App, msg: &Msg) -> App {
    let mut next = app.clone();
    match *msg {
        Msg::Header(v) => next.header = v,
        Msg::Body(v) => next.body = v,
        Msg::Footer(v) => next.footer = v,
        Msg::All(v) => {
            next.header = v;
            next.body = v;
            next.footer = v;
        }
        Msg::Break(flag) => next.broken = flag,
        Msg::Touch => {}
    }
    next
}

/// Render host that queues requests and can run a hook on each one.
#[derive(Default)]
struct Host {
    queue: RenderQueue,
    hook: Mutex<Option<Hook>>,
}

impl RenderHost for Host {
    fn request_render(&self, node: NodeId) {
        self.queue.request_render(node);
        let hook = self.hook.lock().clone();
        if let Some(hook) = hook {
            hook(node);
        }
    }
}

/// Minimal host renderer: mounts nodes, renders them and fires lifecycle
/// hooks in the order a real renderer would.
struct Tree {
    store: Arc<AppStore>,
    host: Arc<Host>,
    nodes: Mutex<HashMap<NodeId, Node>>,
    log: Arc<Mutex<Vec<String>>>,
}

impl Tree {
    fn new() -> Self {
        Self {
            store: Arc::new(BasicStore::new(App::default(), reduce)),
            host: Arc::new(Host::default()),
            nodes: Mutex::new(HashMap::new()),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn root_context(&self) -> ConnectContext<AppStore> {
        Provider::new(Arc::clone(&self.store)).context()
    }

    /// Connector whose state stage reads one field and logs each call.
    fn field(&self, name: &'static str, read: fn(&App) -> i64) -> Arc<Connector<AppStore>> {
        let log = Arc::clone(&self.log);
        connect::<AppStore>(name)
            .map_state(MapToProps::try_unary(move |app: &App| {
                log.lock().push(format!("map:{name}"));
                if app.broken {
                    return Err(format!("{name} cannot read a broken app").into());
                }
                Ok(Props::from([("value", read(app))]).into())
            }))
            .build()
            .unwrap()
    }

    /// Construct and render a node. Call `commit` once its subtree is built.
    fn mount(&self, connector: Arc<Connector<AppStore>>, ctx: &ConnectContext<AppStore>) -> Node {
        let node = ConsumerNode::mount(connector, self.host.clone(), ctx, Props::new()).unwrap();
        self.nodes.lock().insert(node.id(), Arc::clone(&node));
        self.render(&node);
        node
    }

    /// Fire `did_mount` children-first, like a host committing a new subtree.
    fn commit(&self, bottom_up: &[&Node]) {
        for node in bottom_up {
            node.did_mount();
        }
    }

    fn render(&self, node: &Node) {
        let entry = match node.render() {
            Ok(_) => format!("render:{}", short(node)),
            Err(_) => format!("error:{}", short(node)),
        };
        self.log.lock().push(entry);
    }

    /// Render every requested node until the queue is empty.
    fn flush(&self) {
        while let Some(id) = self.host.queue.pop() {
            let node = self.nodes.lock().get(&id).cloned();
            let Some(node) = node else { continue };
            if node.notify_state() == NotifyState::Unmounted {
                continue;
            }
            self.render(&node);
            node.did_update();
        }
    }

    fn unmount(&self, node: &Node) {
        node.will_unmount();
        self.nodes.lock().remove(&node.id());
    }

    fn take_log(&self) -> Vec<String> {
        std::mem::take(&mut *self.log.lock())
    }

    fn set_hook(&self, hook: impl Fn(NodeId) + Send + Sync + 'static) {
        *self.host.hook.lock() = Some(Arc::new(hook));
    }
}

fn short(node: &Node) -> &str {
    node.connector().wrapped_name()
}

fn props_value(props: &Props) -> Option<i64> {
    props.get("value").and_then(Value::as_int)
}

/// A → B → C, each reading a field.
fn chain(tree: &Tree) -> (Node, Node, Node) {
    let a = tree.mount(tree.field("A", |app| app.header), &tree.root_context());
    let b = tree.mount(tree.field("B", |app| app.body), &a.child_context());
    let c = tree.mount(tree.field("C", |app| app.footer), &b.child_context());
    tree.commit(&[&c, &b, &a]);
    tree.flush();
    tree.take_log();
    (a, b, c)
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn notifications_flow_top_down() {
    let tree = Tree::new();
    let (a, b, c) = chain(&tree);

    assert_eq!(tree.store.subscriber_count(), 1);
    assert_eq!(a.subscription().unwrap().nested_count(), 1);
    assert_eq!(b.subscription().unwrap().nested_count(), 1);
    assert!(c.is_subscribed());

    tree.store.dispatch(Msg::All(1));
    // Only the root has heard anything so far.
    assert_eq!(tree.take_log(), vec!["map:A"]);

    tree.flush();
    assert_eq!(
        tree.take_log(),
        vec!["render:A", "map:B", "render:B", "map:C", "render:C"]
    );
}

#[test]
fn unchanged_ancestor_forwards_immediately() {
    let tree = Tree::new();
    let (_a, b, _c) = chain(&tree);

    tree.store.dispatch(Msg::Footer(9));
    assert_eq!(tree.take_log(), vec!["map:A", "map:B", "map:C"]);

    tree.flush();
    assert_eq!(tree.take_log(), vec!["render:C"]);
    assert_eq!(b.render_count(), 1);
}

#[test]
fn descendant_waits_for_ancestor_commit() {
    let tree = Tree::new();
    let (a, _b, c) = chain(&tree);

    tree.store.dispatch(Msg::All(2));
    assert_eq!(a.notify_state(), NotifyState::PendingNotify);
    // C still shows the state its ancestors last rendered.
    assert_eq!(c.derived_props().as_ref().and_then(props_value), Some(0));

    tree.flush();
    assert_eq!(c.derived_props().as_ref().and_then(props_value), Some(2));
}

#[test]
fn passive_intermediate_is_skipped_by_subscription_tree() {
    let tree = Tree::new();
    let a = tree.mount(tree.field("A", |app| app.header), &tree.root_context());
    let layout = tree.mount(connect::<AppStore>("Layout").build().unwrap(), &a.child_context());
    let c = tree.mount(tree.field("C", |app| app.footer), &layout.child_context());
    tree.commit(&[&c, &layout, &a]);
    tree.flush();
    tree.take_log();

    assert!(!layout.is_subscribed());
    // C nests under A through the passive layout node.
    assert_eq!(a.subscription().unwrap().nested_count(), 1);

    tree.store.dispatch(Msg::All(3));
    tree.flush();
    assert_eq!(tree.take_log(), vec!["map:A", "render:A", "map:C", "render:C"]);
}

// ============================================================================
// Rendering
// ============================================================================

#[test]
fn count_scenario() {
    let tree = Tree::new();
    let log = Arc::clone(&tree.log);
    let counter = connect::<AppStore>("Counter")
        .map_state(MapToProps::unary(move |app: &App| {
            log.lock().push("map:Counter".into());
            Props::from([("count", app.body)]).into()
        }))
        .build()
        .unwrap();
    let node = tree.mount(counter, &tree.root_context());
    tree.commit(&[&node]);
    tree.flush();
    tree.take_log();

    tree.store.dispatch(Msg::Body(1));
    assert!(node.last_run_changed());
    tree.flush();
    assert_eq!(tree.take_log(), vec!["map:Counter", "render:Counter"]);
    assert_eq!(node.render().unwrap().get("count"), Some(&Value::Int(1)));

    // Same inputs again: nothing changes and nothing is owed.
    assert!(!node.receive_props(Props::new()));
    assert!(!node.last_run_changed());
}

#[test]
fn identical_state_props_cause_no_render() {
    let tree = Tree::new();
    let (a, b, c) = chain(&tree);

    tree.store.dispatch(Msg::Touch);
    tree.flush();

    assert_eq!(tree.take_log(), vec!["map:A", "map:B", "map:C"]);
    for node in [&a, &b, &c] {
        assert!(!node.last_run_changed());
        assert!(!node.should_update());
    }
}

#[test]
fn props_only_change_skips_state_independent_mapping() {
    let tree = Tree::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();
    let row = connect::<AppStore>("Row")
        .map_state(MapToProps::unary(move |app: &App| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Props::from([("body", app.body)]).into()
        }))
        .build()
        .unwrap();
    let node = tree.mount(row, &tree.root_context());
    tree.commit(&[&node]);
    let after_mount = calls.load(Ordering::SeqCst);

    assert!(node.receive_props(Props::from([("index", 4)])));
    assert_eq!(calls.load(Ordering::SeqCst), after_mount);

    let props = node.render().unwrap();
    assert_eq!(props.get("index"), Some(&Value::Int(4)));
    assert_eq!(props.get("body"), Some(&Value::Int(0)));
}

#[test]
fn props_dependent_mapping_reruns_on_props_change() {
    let tree = Tree::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();
    let cell = connect::<AppStore>("Cell")
        .map_state(MapToProps::binary(move |app: &App, own: &Props| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            let scale = own.get("scale").and_then(Value::as_int).unwrap_or(1);
            Props::from([("scaled", app.body * scale)]).into()
        }))
        .build()
        .unwrap();
    let node = tree.mount(cell, &tree.root_context());
    tree.commit(&[&node]);
    tree.store.dispatch(Msg::Body(3));
    tree.flush();
    let before = calls.load(Ordering::SeqCst);

    assert!(node.receive_props(Props::from([("scale", 2)])));
    assert_eq!(calls.load(Ordering::SeqCst), before + 1);
    assert_eq!(node.render().unwrap().get("scaled"), Some(&Value::Int(6)));
}

#[test]
fn impure_connector_renders_on_every_notification() {
    let tree = Tree::new();
    let ticker = connect::<AppStore>("Ticker")
        .map_state(MapToProps::unary(|app: &App| Props::from([("header", app.header)]).into()))
        .options(ConnectOptions {
            pure: false,
            ..ConnectOptions::default()
        })
        .build()
        .unwrap();
    let node = tree.mount(ticker, &tree.root_context());
    tree.commit(&[&node]);
    tree.flush();
    tree.take_log();

    tree.store.dispatch(Msg::Touch);
    tree.store.dispatch(Msg::Touch);
    tree.flush();

    // Deduplicated by the queue, but requested for each notification.
    assert_eq!(tree.take_log(), vec!["render:Ticker"]);
    assert!(tree.host.queue.total_requests() >= 2);
    assert!(node.receive_props(Props::new()));
}

#[test]
fn selector_error_surfaces_on_render_and_clears() {
    let tree = Tree::new();
    let (a, b, _c) = chain(&tree);

    tree.store.dispatch(Msg::Break(true));
    tree.flush();
    let log = tree.take_log();
    assert!(log.contains(&"error:A".to_string()));
    assert!(log.contains(&"error:B".to_string()));

    match a.render() {
        Err(Error::Mapping { method, display_name, .. }) => {
            assert_eq!(method, "map_state_to_props");
            assert_eq!(display_name, "Connect(A)");
        }
        other => panic!("expected mapping error, got {other:?}"),
    }

    tree.store.dispatch(Msg::Break(false));
    tree.flush();
    assert!(a.render().is_ok());
    assert!(b.render().is_ok());
}

// ============================================================================
// Unmounting
// ============================================================================

#[test]
fn unmount_mid_notification_silences_subtree() {
    let tree = Tree::new();
    let ctx = tree.root_context();
    let first = tree.mount(tree.field("First", |app| app.header), &ctx);
    let second = tree.mount(tree.field("Second", |app| app.header), &ctx);
    let nested = tree.mount(tree.field("Nested", |app| app.header), &second.child_context());
    tree.commit(&[&first, &nested, &second]);
    tree.flush();
    tree.take_log();
    assert_eq!(tree.store.subscriber_count(), 2);

    // When First asks to render, the host tears Second's subtree down.
    let first_id = first.id();
    let doomed: Vec<Weak<ConsumerNode<AppStore>>> =
        vec![Arc::downgrade(&second), Arc::downgrade(&nested)];
    tree.set_hook(move |node| {
        if node == first_id {
            for doomed in &doomed {
                if let Some(doomed) = doomed.upgrade() {
                    doomed.will_unmount();
                }
            }
        }
    });

    tree.store.dispatch(Msg::Header(5));
    tree.flush();

    assert_eq!(tree.take_log(), vec!["map:First", "render:First"]);
    assert_eq!(second.notify_state(), NotifyState::Unmounted);
    assert_eq!(nested.render_count(), 1);
    assert_eq!(tree.store.subscriber_count(), 1);

    tree.unmount(&second);
    tree.unmount(&nested);
}

#[test]
fn descendant_unmounting_its_own_chain_mid_pass() {
    let tree = Tree::new();
    let (a, b, c) = chain(&tree);

    // C's own render request tears down A, B and C while B is still
    // propagating to it.
    let c_id = c.id();
    let doomed: Vec<Weak<ConsumerNode<AppStore>>> =
        vec![Arc::downgrade(&a), Arc::downgrade(&b), Arc::downgrade(&c)];
    tree.set_hook(move |node| {
        if node == c_id {
            for doomed in &doomed {
                if let Some(doomed) = doomed.upgrade() {
                    doomed.will_unmount();
                }
            }
        }
    });

    tree.store.dispatch(Msg::All(1));
    tree.flush();

    assert_eq!(
        tree.take_log(),
        vec!["map:A", "render:A", "map:B", "render:B", "map:C"]
    );
    for node in [&a, &b, &c] {
        assert_eq!(node.notify_state(), NotifyState::Unmounted);
        assert!(!node.is_subscribed());
    }
    assert_eq!(tree.store.subscriber_count(), 0);

    tree.store.dispatch(Msg::All(2));
    tree.flush();
    assert!(tree.take_log().is_empty());
}

#[test]
fn unmounted_root_leaves_store() {
    let tree = Tree::new();
    let (a, b, c) = chain(&tree);

    tree.unmount(&c);
    tree.unmount(&b);
    tree.unmount(&a);
    assert_eq!(tree.store.subscriber_count(), 0);

    tree.store.dispatch(Msg::All(1));
    tree.flush();
    assert!(tree.take_log().is_empty());
}

// ============================================================================
// Store channels
// ============================================================================

#[test]
fn explicit_store_chain_nests_through_explicit_subscription() {
    let tree = Tree::new();
    let empty = ConnectContext::empty();

    let parent = ConsumerNode::mount_explicit(
        tree.field("Parent", |app| app.header),
        tree.host.clone(),
        &empty,
        ExplicitStore::new(Arc::clone(&tree.store)),
        Props::new(),
    );
    let child = ConsumerNode::mount_explicit(
        tree.field("Child", |app| app.header),
        tree.host.clone(),
        &parent.child_context(),
        ExplicitStore::new(Arc::clone(&tree.store))
            .with_subscription(parent.explicit_subscription()),
        Props::new(),
    );
    for node in [&parent, &child] {
        tree.nodes.lock().insert(node.id(), Arc::clone(node));
        tree.render(node);
    }
    tree.commit(&[&child, &parent]);
    tree.flush();
    tree.take_log();

    assert_eq!(tree.store.subscriber_count(), 1);

    tree.store.dispatch(Msg::Header(1));
    tree.flush();
    assert_eq!(
        tree.take_log(),
        vec!["map:Parent", "render:Parent", "map:Child", "render:Child"]
    );
}

#[test]
fn explicit_node_does_not_provide_ambient_store() {
    let tree = Tree::new();
    let parent = ConsumerNode::mount_explicit(
        tree.field("Parent", |app| app.header),
        tree.host.clone(),
        &ConnectContext::empty(),
        ExplicitStore::new(Arc::clone(&tree.store)),
        Props::new(),
    );

    let result = ConsumerNode::mount(
        tree.field("Orphan", |app| app.body),
        tree.host.clone(),
        &parent.child_context(),
        Props::new(),
    );
    assert!(matches!(
        result,
        Err(Error::MissingStore { ref display_name, .. }) if display_name == "Connect(Orphan)"
    ));
}

#[test]
fn explicit_node_under_provider_passes_context_through() {
    let tree = Tree::new();
    let a = tree.mount(tree.field("A", |app| app.header), &tree.root_context());

    let other: Arc<AppStore> = Arc::new(BasicStore::new(App::default(), reduce));
    let island = ConsumerNode::mount_explicit(
        tree.field("Island", |app| app.header),
        tree.host.clone(),
        &a.child_context(),
        ExplicitStore::new(Arc::clone(&other)),
        Props::new(),
    );
    let below = tree.mount(tree.field("Below", |app| app.header), &island.child_context());
    tree.commit(&[&below, &island, &a]);

    // Below sees A's store and nests under A, not under the island.
    assert!(Arc::ptr_eq(below.store(), &tree.store));
    assert_eq!(a.subscription().unwrap().nested_count(), 1);
    assert_eq!(other.subscriber_count(), 1);
}
