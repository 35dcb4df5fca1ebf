//! Occupancy tracking.
//!
//! `OccupancyTracker` turns per-frame people counts into occupancy events:
//!
//! - a rise in count is an entry; the cumulative total grows by the rise and an
//!   `EntryDelta` carries the new total
//! - a drop in count is an exit; an `ExitDuration` carries the seconds since
//!   the current episode started
//! - every frame produces an `InstantCount` heartbeat with the raw count
//!
//! An episode starts on the first non-zero count after `Idle` and ends only when
//! the count returns to zero. A partial drop followed by a new rise stays inside
//! the same episode.

use std::time::Duration;

use crate::detect::FrameObservation;

/// Episode phase. `Occupied` iff the last accepted count was non-zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Occupied { episode_start: Duration },
}

/// Outbound occupancy fact.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OccupancyEvent {
    /// People entered; carries the cumulative total after the entry.
    EntryDelta { total: u64 },
    /// People left; carries whole seconds since the episode started.
    ExitDuration { seconds: u64 },
    /// Per-frame heartbeat with the current count.
    InstantCount { count: u64 },
}

/// Occupancy state for one stream run.
#[derive(Debug)]
pub struct OccupancyTracker {
    last_count: u64,
    total_count: u64,
    phase: Phase,
}

impl OccupancyTracker {
    pub fn new() -> Self {
        Self {
            last_count: 0,
            total_count: 0,
            phase: Phase::Idle,
        }
    }

    /// Apply one frame and return its events, delta event first.
    pub fn observe(&mut self, observation: &FrameObservation) -> Vec<OccupancyEvent> {
        let count = observation.count() as u64;
        let timestamp = observation.timestamp();
        let mut events = Vec::with_capacity(2);

        if count > self.last_count {
            if self.phase == Phase::Idle {
                self.phase = Phase::Occupied {
                    episode_start: timestamp,
                };
            }
            self.total_count += count - self.last_count;
            events.push(OccupancyEvent::EntryDelta {
                total: self.total_count,
            });
        } else if count < self.last_count {
            // last_count > 0 here, so the tracker is Occupied.
            if let Phase::Occupied { episode_start } = self.phase {
                let seconds = timestamp.saturating_sub(episode_start).as_secs();
                events.push(OccupancyEvent::ExitDuration { seconds });
            }
            if count == 0 {
                self.phase = Phase::Idle;
            }
        }

        events.push(OccupancyEvent::InstantCount { count });
        self.last_count = count;
        events
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn last_count(&self) -> u64 {
        self.last_count
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Start of the current episode, if one is active.
    pub fn episode_start(&self) -> Option<Duration> {
        match self.phase {
            Phase::Idle => None,
            Phase::Occupied { episode_start } => Some(episode_start),
        }
    }
}

impl Default for OccupancyTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn observation(seconds: u64, count: usize) -> FrameObservation {
        FrameObservation::from_count(Duration::from_secs(seconds), count)
    }

    fn run(counts: &[usize]) -> (OccupancyTracker, Vec<Vec<OccupancyEvent>>) {
        let mut tracker = OccupancyTracker::new();
        let events = counts
            .iter()
            .enumerate()
            .map(|(i, &count)| tracker.observe(&observation(i as u64, count)))
            .collect();
        (tracker, events)
    }

    #[test]
    fn entry_exit_scenario() {
        use OccupancyEvent::*;

        let (tracker, events) = run(&[0, 0, 1, 1, 2, 1, 0]);

        assert_eq!(events[0], vec![InstantCount { count: 0 }]);
        assert_eq!(events[1], vec![InstantCount { count: 0 }]);
        assert_eq!(
            events[2],
            vec![EntryDelta { total: 1 }, InstantCount { count: 1 }]
        );
        assert_eq!(events[3], vec![InstantCount { count: 1 }]);
        assert_eq!(
            events[4],
            vec![EntryDelta { total: 2 }, InstantCount { count: 2 }]
        );
        assert_eq!(
            events[5],
            vec![ExitDuration { seconds: 3 }, InstantCount { count: 1 }]
        );
        assert_eq!(
            events[6],
            vec![ExitDuration { seconds: 4 }, InstantCount { count: 0 }]
        );

        assert_eq!(tracker.total_count(), 2);
        assert_eq!(tracker.phase(), Phase::Idle);
        assert_eq!(tracker.episode_start(), None);
    }

    #[test]
    fn empty_stream_only_emits_heartbeats() {
        let (tracker, events) = run(&[0; 25]);
        assert_eq!(tracker.total_count(), 0);
        for frame in events {
            assert_eq!(frame, vec![OccupancyEvent::InstantCount { count: 0 }]);
        }
    }

    #[test]
    fn episode_start_survives_partial_exit_and_reentry() {
        let mut tracker = OccupancyTracker::new();
        tracker.observe(&observation(10, 2));
        tracker.observe(&observation(12, 1));
        assert_eq!(tracker.episode_start(), Some(Duration::from_secs(10)));

        let events = tracker.observe(&observation(15, 3));
        assert_eq!(events[0], OccupancyEvent::EntryDelta { total: 4 });
        assert_eq!(tracker.episode_start(), Some(Duration::from_secs(10)));

        let events = tracker.observe(&observation(20, 0));
        assert_eq!(events[0], OccupancyEvent::ExitDuration { seconds: 10 });
        assert_eq!(tracker.phase(), Phase::Idle);
    }

    #[test]
    fn new_episode_after_idle_restarts_the_clock() {
        let mut tracker = OccupancyTracker::new();
        tracker.observe(&observation(1, 1));
        tracker.observe(&observation(4, 0));
        tracker.observe(&observation(30, 2));
        let events = tracker.observe(&observation(32, 0));
        assert_eq!(events[0], OccupancyEvent::ExitDuration { seconds: 2 });
        assert_eq!(tracker.total_count(), 3);
    }

    #[test]
    fn duration_truncates_to_whole_seconds() {
        let mut tracker = OccupancyTracker::new();
        tracker.observe(&FrameObservation::from_count(Duration::from_millis(500), 1));
        let events = tracker.observe(&FrameObservation::from_count(Duration::from_millis(2_400), 0));
        assert_eq!(events[0], OccupancyEvent::ExitDuration { seconds: 1 });
    }

    #[test]
    fn random_sequences_keep_total_and_heartbeat_invariants() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let len = rng.gen_range(1..60);
            let counts: Vec<usize> = (0..len).map(|_| rng.gen_range(0..6)).collect();
            let (tracker, events) = run(&counts);

            let mut expected_total = 0u64;
            let mut previous = 0usize;
            let mut last_total = 0u64;
            for (frame, &count) in events.iter().zip(&counts) {
                if count > previous {
                    expected_total += (count - previous) as u64;
                }
                previous = count;

                let heartbeats: Vec<_> = frame
                    .iter()
                    .filter(|e| matches!(e, OccupancyEvent::InstantCount { .. }))
                    .collect();
                assert_eq!(
                    heartbeats,
                    vec![&OccupancyEvent::InstantCount {
                        count: count as u64
                    }]
                );
                for event in frame {
                    if let OccupancyEvent::EntryDelta { total } = event {
                        assert!(*total > last_total);
                        last_total = *total;
                    }
                }
            }
            assert_eq!(tracker.total_count(), expected_total);
            assert_eq!(tracker.last_count(), *counts.last().unwrap() as u64);
            assert_eq!(
                tracker.phase() == Phase::Idle,
                tracker.last_count() == 0
            );
        }
    }

    #[test]
    fn replaying_a_sequence_is_deterministic() {
        let counts = [0, 3, 3, 1, 4, 0, 0, 2, 5, 1, 0];
        let (first, first_events) = run(&counts);
        let (second, second_events) = run(&counts);
        assert_eq!(first.total_count(), second.total_count());
        assert_eq!(first_events, second_events);
    }
}
