//! Queue event system for progress observers.
//!
//! [`EventBus`] wraps a `tokio::sync::broadcast` channel with a bounded
//! ring-buffer of recent events so that late-joining subscribers can catch up.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::ids::{JobId, ResultId};
use crate::media::ResultSource;

/// Maximum number of events retained in the ring buffer.
const MAX_RECENT_EVENTS: usize = 100;

// ---------------------------------------------------------------------------
// EventCategory
// ---------------------------------------------------------------------------

/// Which part of the engine emitted an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    /// Job queue lifecycle and progress.
    Queue,
    /// Result aggregator changes.
    Results,
}

// ---------------------------------------------------------------------------
// EventPayload
// ---------------------------------------------------------------------------

/// Payload describing what happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    // -- Job lifecycle -------------------------------------------------------
    JobQueued {
        job_id: JobId,
        file_name: String,
        copies: u32,
    },
    JobStarted {
        job_id: JobId,
    },
    /// Coarse per-copy progress: `round(done / copies * 100)`.
    JobProgress {
        job_id: JobId,
        progress: u8,
        completed_copies: u32,
    },
    /// Fine-grained progress reported by a backend while one copy runs.
    CopyProgress {
        job_id: JobId,
        variant_index: usize,
        percent: f32,
        step: String,
    },
    JobCompleted {
        job_id: JobId,
        artifacts: usize,
    },
    JobFailed {
        job_id: JobId,
        error: String,
    },
    JobRetried {
        job_id: JobId,
    },
    JobRemoved {
        job_id: JobId,
    },
    QueueCleared {
        removed: usize,
    },

    // -- Results -------------------------------------------------------------
    ResultsAdded {
        result_ids: Vec<ResultId>,
        source: ResultSource,
    },
    ResultRemoved {
        result_id: ResultId,
    },
    ResultsCleared {
        removed: usize,
    },
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A timestamped, categorised event ready for broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub category: EventCategory,
    pub payload: EventPayload,
}

impl Event {
    /// Create a new event with a fresh UUID and the current timestamp.
    pub fn new(category: EventCategory, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            category,
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Broadcast channel with a bounded ring buffer of recent events.
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    recent: RwLock<VecDeque<Event>>,
}

impl EventBus {
    /// Create a new event bus.
    ///
    /// `capacity` controls the broadcast channel buffer size (not the ring
    /// buffer, which is always [`MAX_RECENT_EVENTS`]).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            recent: RwLock::new(VecDeque::with_capacity(MAX_RECENT_EVENTS)),
        }
    }

    /// Subscribe to the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Broadcast an event to all current subscribers and store it in the
    /// ring buffer.
    pub fn broadcast(&self, category: EventCategory, payload: EventPayload) {
        let event = Event::new(category, payload);

        {
            let mut recent = self.recent.write();
            if recent.len() >= MAX_RECENT_EVENTS {
                recent.pop_back();
            }
            recent.push_front(event.clone());
        }

        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    /// Return the `n` most recent events (newest first).
    pub fn recent_events(&self, n: usize) -> Vec<Event> {
        let recent = self.recent.read();
        recent.iter().take(n).cloned().collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let job_id = JobId::new();
        bus.broadcast(EventCategory::Queue, EventPayload::JobStarted { job_id });

        let event = rx.try_recv().unwrap();
        assert_eq!(event.category, EventCategory::Queue);
        match &event.payload {
            EventPayload::JobStarted { job_id: received } => assert_eq!(*received, job_id),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn recent_events_capped() {
        let bus = EventBus::new(256);
        let job_id = JobId::new();

        for _ in 0..150 {
            bus.broadcast(EventCategory::Queue, EventPayload::JobStarted { job_id });
        }

        assert_eq!(bus.recent_events(200).len(), MAX_RECENT_EVENTS);
    }

    #[test]
    fn recent_events_newest_first() {
        let bus = EventBus::new(16);
        for _ in 0..5 {
            bus.broadcast(EventCategory::Queue, EventPayload::JobStarted { job_id: JobId::new() });
        }
        bus.broadcast(EventCategory::Results, EventPayload::ResultsCleared { removed: 3 });

        let recent = bus.recent_events(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].category, EventCategory::Results);
    }

    #[test]
    fn no_subscribers_does_not_panic() {
        let bus = EventBus::new(4);
        bus.broadcast(
            EventCategory::Queue,
            EventPayload::JobFailed {
                job_id: JobId::new(),
                error: "test".into(),
            },
        );
    }

    #[test]
    fn payload_tag_is_snake_case() {
        let payload = EventPayload::CopyProgress {
            job_id: JobId::new(),
            variant_index: 1,
            percent: 42.0,
            step: "encoding".into(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "copy_progress");
        assert_eq!(json["variant_index"], 1);
    }
}
