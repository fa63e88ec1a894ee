// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::severity::Severity;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

const DEFAULT_QUEUE_CAPACITY: usize = 1_000;

/// Advisory notifications emitted by the engine.
///
/// These are monitoring signals, never errors: emitting one must not
/// interrupt the operation that produced it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineEvent {
    Degradation {
        model: String,
        metric: String,
        previous: f64,
        current: f64,
        at: DateTime<Utc>,
    },
    Drift {
        model: String,
        statistic: f64,
        severity: Severity,
        at: DateTime<Utc>,
    },
    AbTestComplete {
        model: String,
        winner: Option<String>,
        z_score: f64,
        significant: bool,
        at: DateTime<Utc>,
    },
    DataQuality {
        source: String,
        detail: String,
        affected: usize,
        at: DateTime<Utc>,
    },
}

impl EngineEvent {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Self::Degradation { at, .. }
            | Self::Drift { at, .. }
            | Self::AbTestComplete { at, .. }
            | Self::DataQuality { at, .. } => *at,
        }
    }
}

/// Receives engine events; implementations must tolerate being called from
/// any component at any point of a computation.
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: &EngineEvent);
}

/// Bounded in-memory event queue the dashboard polls.
///
/// Oldest events are dropped on overflow; nothing is persisted, so a restart
/// loses alert history along with all other engine state.
#[derive(Debug)]
pub struct EventQueue {
    capacity: usize,
    events: Mutex<VecDeque<EngineEvent>>,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity: capacity.max(1),
            events: Mutex::new(VecDeque::new()),
        })
    }

    pub fn with_default_capacity() -> Arc<Self> {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Removes and returns all queued events, oldest first.
    pub fn drain(&self) -> Vec<EngineEvent> {
        self.events.lock().drain(..).collect()
    }

    /// Returns up to `limit` most recent events without consuming them.
    pub fn recent(&self, limit: usize) -> Vec<EngineEvent> {
        let events = self.events.lock();
        events
            .iter()
            .rev()
            .take(limit)
            .rev()
            .cloned()
            .collect()
    }
}

impl EventSink for EventQueue {
    fn on_event(&self, event: &EngineEvent) {
        let mut events = self.events.lock();
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::{EngineEvent, EventQueue, EventSink};
    use crate::severity::Severity;
    use chrono::Utc;

    fn drift_event(model: &str, statistic: f64) -> EngineEvent {
        EngineEvent::Drift {
            model: model.to_string(),
            statistic,
            severity: Severity::from_score(statistic),
            at: Utc::now(),
        }
    }

    #[test]
    fn queue_preserves_insertion_order() {
        let queue = EventQueue::new(10);
        queue.on_event(&drift_event("a", 0.2));
        queue.on_event(&drift_event("b", 0.4));

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        match &drained[0] {
            EngineEvent::Drift { model, .. } => assert_eq!(model, "a"),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn overflow_drops_oldest_first() {
        let queue = EventQueue::new(2);
        queue.on_event(&drift_event("a", 0.1));
        queue.on_event(&drift_event("b", 0.2));
        queue.on_event(&drift_event("c", 0.3));

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        match &drained[0] {
            EngineEvent::Drift { model, .. } => assert_eq!(model, "b"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn recent_peeks_without_consuming() {
        let queue = EventQueue::new(10);
        for i in 0..5 {
            queue.on_event(&drift_event("m", i as f64 / 10.0));
        }
        let recent = queue.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(queue.len(), 5);
        match &recent[1] {
            EngineEvent::Drift { statistic, .. } => assert_eq!(*statistic, 0.4),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn events_serialize_with_kind_tag() {
        let encoded = serde_json::to_value(drift_event("m", 0.35)).unwrap();
        assert_eq!(encoded["kind"], "drift");
        assert_eq!(encoded["severity"], "low");
    }
}
