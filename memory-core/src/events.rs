//! Event Stream (§4.7): broadcasts memory side effects to per-user,
//! per-session, and global subscribers.
//!
//! Each subscription is an independent bounded queue; producers never
//! block — an overflowing queue drops the newest event for that
//! subscription and the producer logs a warning and moves on (§4.7, §5).

use crate::constants::defaults;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// The kind of side effect an [`Event`] reports (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    MemoryCreated,
    MemoryUpdated,
    MemoryDeleted,
    MemoryRetrieved,
}

/// One memory-layer event (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub user_id: String,
    pub session_id: Option<String>,
    pub memory_id: Option<uuid::Uuid>,
    pub memory_type: Option<String>,
    pub content: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    #[must_use]
    pub fn new(event_type: EventType, user_id: impl Into<String>) -> Self {
        Self {
            event_type,
            user_id: user_id.into(),
            session_id: None,
            memory_id: None,
            memory_type: None,
            content: None,
            metadata: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    #[must_use]
    pub fn with_memory(mut self, id: uuid::Uuid, memory_type: impl Into<String>) -> Self {
        self.memory_id = Some(id);
        self.memory_type = Some(memory_type.into());
        self
    }

    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

/// The scope a subscriber attaches to (§3 `EventSubscription`, §4.7).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubscriptionScope {
    User(String),
    Session(String),
    Global,
}

/// A live attachment to the event stream. Dropping this (or exhausting the
/// receiver via [`EventSubscription::recv`] returning `None`) removes the
/// subscription from its scope's set (§4.7 "Lifecycle").
pub struct EventSubscription {
    scope: SubscriptionScope,
    id: u64,
    receiver: mpsc::Receiver<Event>,
    registry: Arc<SubscriptionRegistry>,
    /// Set once a producer drops an event for this subscription because its
    /// queue was full; surfaced to the consumer on the next successful
    /// receive (§8 "Subscription queue saturation").
    gap: Arc<std::sync::atomic::AtomicBool>,
}

impl EventSubscription {
    /// Receive the next event, or `None` once the stream has closed.
    ///
    /// If this subscription dropped at least one event since the last
    /// successful receive (queue overflow), the returned tuple's second
    /// element is `true` — a gap indicator, not a replay (§8).
    pub async fn recv(&mut self) -> Option<(Event, bool)> {
        let event = self.receiver.recv().await?;
        let had_gap = self.gap.swap(false, Ordering::SeqCst);
        Some((event, had_gap))
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.registry.remove(&self.scope, self.id);
    }
}

struct Subscriber {
    id: u64,
    sender: mpsc::Sender<Event>,
    gap: Arc<std::sync::atomic::AtomicBool>,
}

#[derive(Default)]
struct SubscriptionRegistry {
    by_scope: Mutex<HashMap<SubscriptionScope, Vec<Subscriber>>>,
    next_id: AtomicU64,
}

impl SubscriptionRegistry {
    fn remove(&self, scope: &SubscriptionScope, id: u64) {
        let mut by_scope = self.by_scope.lock();
        if let Some(subs) = by_scope.get_mut(scope) {
            subs.retain(|s| s.id != id);
            if subs.is_empty() {
                by_scope.remove(scope);
            }
        }
    }
}

/// The broadcast hub: one lock per scope key, bounded per-subscription
/// queues, drop-newest-on-overflow (§4.7, §5).
#[derive(Default)]
pub struct EventStream {
    registry: Arc<SubscriptionRegistry>,
}

impl EventStream {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new subscription to a scope (§3 `EventSubscription`).
    #[must_use]
    pub fn subscribe(&self, scope: SubscriptionScope) -> EventSubscription {
        self.subscribe_with_capacity(scope, defaults::SUBSCRIPTION_QUEUE_CAPACITY)
    }

    #[must_use]
    pub fn subscribe_with_capacity(&self, scope: SubscriptionScope, capacity: usize) -> EventSubscription {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let id = self.registry.next_id.fetch_add(1, Ordering::SeqCst);
        let gap = Arc::new(std::sync::atomic::AtomicBool::new(false));
        self.registry
            .by_scope
            .lock()
            .entry(scope.clone())
            .or_default()
            .push(Subscriber { id, sender, gap: gap.clone() });

        EventSubscription {
            scope,
            id,
            receiver,
            registry: self.registry.clone(),
            gap,
        }
    }

    /// Deliver `event` to every subscriber whose scope it matches: the
    /// event's `user_id`, its `session_id` (if any), and the global scope.
    /// Per-subscription FIFO; no ordering guarantee across subscriptions
    /// (§4.7 "Delivery order").
    pub fn publish(&self, event: Event) {
        let mut scopes = vec![SubscriptionScope::User(event.user_id.clone()), SubscriptionScope::Global];
        if let Some(session_id) = &event.session_id {
            scopes.push(SubscriptionScope::Session(session_id.clone()));
        }

        let by_scope = self.registry.by_scope.lock();
        for scope in &scopes {
            let Some(subs) = by_scope.get(scope) else { continue };
            for sub in subs {
                if let Err(mpsc::error::TrySendError::Full(_)) = sub.sender.try_send(event.clone()) {
                    tracing::warn!(user_id = %event.user_id, subscriber_id = sub.id, "subscription queue full, dropping event");
                    sub.gap.store(true, Ordering::SeqCst);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(user_id: &str) -> Event {
        Event::new(EventType::MemoryCreated, user_id)
    }

    #[tokio::test]
    async fn subscriber_receives_published_event_for_its_user() {
        let stream = EventStream::new();
        let mut sub = stream.subscribe(SubscriptionScope::User("u1".to_string()));
        stream.publish(event("u1"));
        let (received, gap) = sub.recv().await.unwrap();
        assert_eq!(received.user_id, "u1");
        assert!(!gap);
    }

    #[tokio::test]
    async fn subscriber_does_not_receive_events_for_other_users() {
        let stream = EventStream::new();
        let mut sub = stream.subscribe(SubscriptionScope::User("u1".to_string()));
        stream.publish(event("u2"));
        stream.publish(event("u1"));
        let (received, _) = sub.recv().await.unwrap();
        assert_eq!(received.user_id, "u1");
    }

    #[tokio::test]
    async fn global_subscriber_receives_every_event() {
        let stream = EventStream::new();
        let mut sub = stream.subscribe(SubscriptionScope::Global);
        stream.publish(event("u1"));
        stream.publish(event("u2"));
        assert_eq!(sub.recv().await.unwrap().0.user_id, "u1");
        assert_eq!(sub.recv().await.unwrap().0.user_id, "u2");
    }

    #[tokio::test]
    async fn session_subscriber_receives_matching_session_events() {
        let stream = EventStream::new();
        let mut sub = stream.subscribe(SubscriptionScope::Session("s1".to_string()));
        stream.publish(event("u1").with_session("s1"));
        stream.publish(event("u1").with_session("s2"));
        let (received, _) = sub.recv().await.unwrap();
        assert_eq!(received.session_id, Some("s1".to_string()));
    }

    #[tokio::test]
    async fn overflow_drops_newest_and_sets_gap_indicator() {
        let stream = EventStream::new();
        let mut sub = stream.subscribe_with_capacity(SubscriptionScope::User("u1".to_string()), 1);
        stream.publish(event("u1")); // fills the queue
        stream.publish(event("u1")); // dropped, overflow
        let (_, gap) = sub.recv().await.unwrap();
        assert!(gap);
    }

    #[tokio::test]
    async fn dropping_subscription_removes_it_from_registry() {
        let stream = EventStream::new();
        let sub = stream.subscribe(SubscriptionScope::User("u1".to_string()));
        assert_eq!(stream.registry.by_scope.lock().len(), 1);
        drop(sub);
        assert_eq!(stream.registry.by_scope.lock().len(), 0);
    }
}
