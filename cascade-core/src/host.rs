//! Render hosts.
//!
//! A consumer node never renders itself. When its derived props change it
//! asks the host for a render with [`RenderHost::request_render`]; the host
//! later calls the node's `render` and then, once the output is committed,
//! its `did_update` hook. Anything that can record a node id can be a host.

use std::collections::{HashSet, VecDeque};
use std::fmt;

use parking_lot::Mutex;

use crate::subscription::NodeId;

/// Receives render requests from consumer nodes.
///
/// Called while a notification pass is in progress, so implementations must
/// not block and should defer the actual render.
pub trait RenderHost: Send + Sync {
    fn request_render(&self, node: NodeId);
}

impl<F> RenderHost for F
where
    F: Fn(NodeId) + Send + Sync,
{
    fn request_render(&self, node: NodeId) {
        self(node)
    }
}

#[derive(Default)]
struct QueueInner {
    order: VecDeque<NodeId>,
    queued: HashSet<NodeId>,
    total: u64,
}

/// FIFO of pending render requests.
///
/// A node already waiting in the queue is not queued twice.
#[derive(Default)]
pub struct RenderQueue {
    inner: Mutex<QueueInner>,
}

impl RenderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next node to render.
    pub fn pop(&self) -> Option<NodeId> {
        let mut inner = self.inner.lock();
        let node = inner.order.pop_front()?;
        inner.queued.remove(&node);
        Some(node)
    }

    /// Take every pending request in order.
    pub fn drain(&self) -> Vec<NodeId> {
        let mut inner = self.inner.lock();
        inner.queued.clear();
        inner.order.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Requests received so far, duplicates included.
    pub fn total_requests(&self) -> u64 {
        self.inner.lock().total
    }
}

impl RenderHost for RenderQueue {
    fn request_render(&self, node: NodeId) {
        let mut inner = self.inner.lock();
        inner.total += 1;
        if inner.queued.insert(node) {
            inner.order.push_back(node);
        }
        tracing::trace!(node = %node, pending = inner.order.len(), "render requested");
    }
}

impl fmt::Debug for RenderQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("RenderQueue")
            .field("pending", &inner.order)
            .field("total", &inner.total)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn queue_is_fifo_and_deduplicated() {
        let queue = RenderQueue::new();
        let (a, b) = (NodeId::new(), NodeId::new());

        queue.request_render(a);
        queue.request_render(b);
        queue.request_render(a);

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.total_requests(), 3);
        assert_eq!(queue.pop(), Some(a));

        // Requeued once popped.
        queue.request_render(a);
        assert_eq!(queue.drain(), vec![b, a]);
        assert!(queue.is_empty());
    }

    #[test]
    fn closures_are_hosts() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let host: Arc<dyn RenderHost> = Arc::new(move |node: NodeId| seen_clone.lock().push(node));

        let node = NodeId::new();
        host.request_render(node);
        assert_eq!(*seen.lock(), vec![node]);
    }
}
