// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/agrotrack

//! Event bus for live subscribers
//!
//! Each subscriber owns a bounded queue. Publishing never waits: when a
//! queue is full the new event is dropped for that subscriber only, so older
//! queued events keep their order. Closed queues are pruned on the next
//! publish.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info};

use crate::detection::Alert;
use crate::sensors::Reading;

/// A reading is considered live for this long
pub const ONLINE_WINDOW_SECS: i64 = 60;

/// Payload of a broadcast event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum EventPayload {
    ReadingUpdate(Reading),
    Alert(Alert),
}

impl EventPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ReadingUpdate(_) => "reading-update",
            Self::Alert(_) => "alert",
        }
    }
}

/// Generic event wrapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub published_at: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

/// Derived liveness of the field network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemStatus {
    Online,
    Offline,
}

/// Online iff the last reading is less than a minute older than `now`
pub fn derive_status(last_reading: Option<DateTime<Utc>>, now: DateTime<Utc>) -> SystemStatus {
    match last_reading {
        Some(ts) if now - ts < Duration::seconds(ONLINE_WINDOW_SECS) => SystemStatus::Online,
        _ => SystemStatus::Offline,
    }
}

/// Subscriber identity
pub type SubscriberId = u64;

/// Outcome of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    /// Queue full, event dropped for that subscriber
    pub dropped: usize,
    /// Subscriber gone, removed from the set
    pub pruned: usize,
}

/// Central event bus for pub/sub communication
pub struct EventBus {
    subscribers: RwLock<HashMap<SubscriberId, mpsc::Sender<Event>>>,
    queue_capacity: usize,
    next_subscriber: AtomicU64,
    event_counter: AtomicU64,
}

impl EventBus {
    pub fn new(queue_capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            subscribers: RwLock::new(HashMap::new()),
            queue_capacity: queue_capacity.max(1),
            next_subscriber: AtomicU64::new(1),
            event_counter: AtomicU64::new(0),
        })
    }

    /// Register a subscriber. Dropping the handle unsubscribes it.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        self.subscribers.write().insert(id, tx);
        debug!("Subscriber {} joined", id);

        Subscription {
            id,
            rx,
            bus: Arc::downgrade(self),
        }
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.write().remove(&id).is_some();
        if removed {
            debug!("Subscriber {} left", id);
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn publish_reading(&self, reading: Reading) -> PublishReport {
        self.publish(EventPayload::ReadingUpdate(reading))
    }

    pub fn publish_alert(&self, alert: Alert) -> PublishReport {
        self.publish(EventPayload::Alert(alert))
    }

    /// Fan an event out to every current subscriber without blocking
    pub fn publish(&self, payload: EventPayload) -> PublishReport {
        let event = Event {
            id: self.event_counter.fetch_add(1, Ordering::Relaxed),
            published_at: Utc::now(),
            payload,
        };

        let mut report = PublishReport::default();
        let mut closed = Vec::new();

        {
            let subscribers = self.subscribers.read();
            for (id, tx) in subscribers.iter() {
                match tx.try_send(event.clone()) {
                    Ok(()) => report.delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        report.dropped += 1;
                        debug!(
                            "Subscriber {} queue full, dropped {} event {}",
                            id,
                            event.payload.kind(),
                            event.id
                        );
                    }
                    Err(TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }

        if !closed.is_empty() {
            let mut subscribers = self.subscribers.write();
            for id in &closed {
                subscribers.remove(id);
            }
            report.pruned = closed.len();
            info!("Pruned {} disconnected subscribers", closed.len());
        }

        report
    }
}

/// Receiving side of a subscriber
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<Event>,
    bus: Weak<EventBus>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next event. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}
