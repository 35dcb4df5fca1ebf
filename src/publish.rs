//! Event publishing.
//!
//! Wire format (JSON payloads):
//!
//! | topic             | payload                 | event          |
//! |-------------------|-------------------------|----------------|
//! | `person`          | `{"total": <int>}`      | `EntryDelta`   |
//! | `person/duration` | `{"duration": <int>}`   | `ExitDuration` |
//! | `person`          | `{"count": <int>}`      | `InstantCount` |
//!
//! Every message is published once, best effort. Failures are logged and
//! counted, never retried and never reported back to the tracker.

use anyhow::Result;
use serde::Serialize;

use crate::tracker::OccupancyEvent;

pub const TOPIC_PERSON: &str = "person";
pub const TOPIC_PERSON_DURATION: &str = "person/duration";

/// Event bus client: delivers one payload to one topic.
pub trait EventBus {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<()>;
}

impl<B: EventBus + ?Sized> EventBus for Box<B> {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<()> {
        (**self).publish(topic, payload)
    }
}

/// Bus that drops every message. Used when MQTT is disabled.
#[derive(Debug, Default)]
pub struct NullBus;

impl EventBus for NullBus {
    fn publish(&mut self, _topic: &str, _payload: &[u8]) -> Result<()> {
        Ok(())
    }
}

#[derive(Serialize)]
struct TotalPayload {
    total: u64,
}

#[derive(Serialize)]
struct DurationPayload {
    duration: u64,
}

#[derive(Serialize)]
struct CountPayload {
    count: u64,
}

impl OccupancyEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            OccupancyEvent::EntryDelta { .. } | OccupancyEvent::InstantCount { .. } => {
                TOPIC_PERSON
            }
            OccupancyEvent::ExitDuration { .. } => TOPIC_PERSON_DURATION,
        }
    }

    /// JSON payload for this event.
    pub fn payload(&self) -> Result<Vec<u8>> {
        let json = match *self {
            OccupancyEvent::EntryDelta { total } => serde_json::to_vec(&TotalPayload { total })?,
            OccupancyEvent::ExitDuration { seconds } => {
                serde_json::to_vec(&DurationPayload { duration: seconds })?
            }
            OccupancyEvent::InstantCount { count } => {
                serde_json::to_vec(&CountPayload { count })?
            }
        };
        Ok(json)
    }
}

/// Publish counters for the run summary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublishStats {
    pub published: u64,
    pub failed: u64,
}

/// Translates occupancy events into bus messages.
pub struct EventPublisher<B: EventBus> {
    bus: B,
    stats: PublishStats,
}

impl<B: EventBus> EventPublisher<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            stats: PublishStats::default(),
        }
    }

    pub fn publish_entry(&mut self, total: u64) {
        self.publish(&OccupancyEvent::EntryDelta { total });
    }

    pub fn publish_exit(&mut self, seconds: u64) {
        self.publish(&OccupancyEvent::ExitDuration { seconds });
    }

    pub fn publish_count(&mut self, count: u64) {
        self.publish(&OccupancyEvent::InstantCount { count });
    }

    /// Single best-effort publish of `event`.
    pub fn publish(&mut self, event: &OccupancyEvent) {
        let topic = event.topic();
        let outcome = event
            .payload()
            .and_then(|payload| self.bus.publish(topic, &payload));
        match outcome {
            Ok(()) => self.stats.published += 1,
            Err(e) => {
                self.stats.failed += 1;
                log::warn!("publish to '{}' failed: {:#}", topic, e);
            }
        }
    }

    pub fn stats(&self) -> PublishStats {
        self.stats
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Give the bus back, e.g. to disconnect it.
    pub fn into_bus(self) -> B {
        self.bus
    }
}
