//! Notifications about topology changes and heartbeats.
//!
//! Events are purely observational. They are delivered after the change they describe
//! has been committed, and nothing in the crate depends on anyone listening.

use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::Duration,
};

use crate::{ClusterDescription, ConnectionError, EndPoint, ServerDescription, ServerId};

#[derive(Clone, Debug)]
pub enum ClusterEvent {
    /// A server is now monitored, either a seed or a newly discovered member.
    ServerAdded {
        end_point: EndPoint,
    },
    ServerRemoved {
        end_point: EndPoint,
        reason: String,
    },
    ServerDescriptionChanged {
        old: ServerDescription,
        new: ServerDescription,
    },
    ClusterDescriptionChanged {
        old: ClusterDescription,
        new: ClusterDescription,
    },
    HeartbeatStarted {
        server_id: ServerId,
    },
    HeartbeatSucceeded {
        server_id: ServerId,
        duration: Duration,
    },
    HeartbeatFailed {
        server_id: ServerId,
        duration: Duration,
        error: Arc<ConnectionError>,
    },
}

pub type EventSubscriber = Arc<dyn Fn(&ClusterEvent) + Send + Sync>;

/// Fans events out to every subscriber.
#[derive(Clone, Default)]
pub struct EventPublisher {
    subscribers: Vec<EventSubscriber>,
}

impl EventPublisher {
    pub fn new(subscribers: Vec<EventSubscriber>) -> Self {
        Self { subscribers }
    }

    pub fn subscribe(&mut self, subscriber: EventSubscriber) {
        self.subscribers.push(subscriber);
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Delivers `event` to each subscriber. A panicking subscriber is logged and skipped.
    pub fn publish(&self, event: ClusterEvent) {
        for subscriber in &self.subscribers {
            if panic::catch_unwind(AssertUnwindSafe(|| subscriber(&event))).is_err() {
                tracing::warn!("An event subscriber panicked while handling {:?}", event);
            }
        }
    }
}

impl fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventPublisher")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
