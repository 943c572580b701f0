//! Fan-out of store notifications to live subscribers.
//!
//! Each subscriber owns an unbounded queue, so a slow reader never blocks the
//! publisher or its peers. Dropping a [`Subscription`] removes its queue.

use futures::Stream;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Event {
    NewDocument { id: String, title: String },
}

pub type SubscriberId = u64;

#[derive(Default)]
struct Registry {
    next_id: SubscriberId,
    queues: Vec<(SubscriberId, mpsc::UnboundedSender<Event>)>,
}

impl Registry {
    fn remove(&mut self, id: SubscriberId) -> bool {
        let before = self.queues.len();
        self.queues.retain(|(sub, _)| *sub != id);
        before != self.queues.len()
    }
}

#[derive(Clone, Default)]
pub struct EventBroadcaster {
    registry: Arc<Mutex<Registry>>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh, empty queue. Events published before this call are
    /// never replayed.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut registry = self.registry.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.queues.push((id, tx));
            id
        };
        tracing::debug!(subscriber = id, "subscriber registered");
        Subscription {
            id,
            rx,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Remove a queue from the registry. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.registry.lock().remove(id);
        if removed {
            tracing::debug!(subscriber = id, "subscriber removed");
        }
        removed
    }

    /// Deliver `event` to every registered queue in registration order and
    /// return how many queues received it. Queues whose receiver has been
    /// dropped are pruned here.
    pub fn publish(&self, event: Event) -> usize {
        let mut registry = self.registry.lock();
        registry
            .queues
            .retain(|(_, tx)| tx.send(event.clone()).is_ok());
        registry.queues.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().queues.len()
    }
}

/// Receiving end of one subscriber queue.
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::UnboundedReceiver<Event>,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next event. Returns `None` once the queue has been
    /// unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

impl Stream for Subscription {
    type Item = Event;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if registry.lock().remove(self.id) {
                tracing::debug!(subscriber = self.id, "subscriber released");
            }
        }
    }
}
