use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};
use std::fmt;
use std::ops::{Add, Sub};
use tracing::trace;

/// Simulated time in seconds.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
pub struct SimTime(pub f64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0.0);

    pub fn as_secs(self) -> f64 {
        self.0
    }
}

impl PartialEq for SimTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SimTime {}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Add<f64> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: f64) -> SimTime {
        SimTime(self.0 + rhs)
    }
}

impl Sub for SimTime {
    type Output = f64;

    fn sub(self, rhs: SimTime) -> f64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}", self.0)
    }
}

/// Handle to a scheduled event, used to cancel timers that lost a race.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct EventKey(u64);

/// Events in a lower class run first among events sharing a timestamp.
pub trait Prioritized {
    fn priority(&self) -> u8 {
        0
    }
}

#[derive(Debug)]
pub struct ScheduledEvent<E> {
    pub at: SimTime,
    pub priority: u8,
    pub seq: u64,
    pub event: E,
}

impl<E> Ord for ScheduledEvent<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at
            .cmp(&other.at)
            .then_with(|| self.priority.cmp(&other.priority))
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl<E> PartialOrd for ScheduledEvent<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> PartialEq for ScheduledEvent<E> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<E> Eq for ScheduledEvent<E> {}

/// Single global simulated-time axis.
///
/// Events are ordered by `(time, priority, sequence)`; the sequence number is
/// assigned at scheduling time, so events sharing a timestamp and priority
/// class run in the order they were scheduled.
pub struct Scheduler<E> {
    now: SimTime,
    next_seq: u64,
    queue: BinaryHeap<Reverse<ScheduledEvent<E>>>,
    cancelled: HashSet<u64>,
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self {
            now: SimTime::ZERO,
            next_seq: 0,
            queue: BinaryHeap::new(),
            cancelled: HashSet::new(),
        }
    }
}

impl<E: Prioritized> Scheduler<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Schedules `event` to fire `delay` time units from now. Negative delays
    /// are treated as zero so the clock never moves backwards.
    pub fn schedule_in(&mut self, delay: f64, event: E) -> EventKey {
        let at = self.now + delay.max(0.0);
        let seq = self.next_seq;
        self.next_seq += 1;
        trace!(now = %self.now, at = %at, seq, "schedule event");
        self.queue.push(Reverse(ScheduledEvent {
            at,
            priority: event.priority(),
            seq,
            event,
        }));
        EventKey(seq)
    }

    pub fn schedule_now(&mut self, event: E) -> EventKey {
        self.schedule_in(0.0, event)
    }

    /// Withdraws a pending event. It will be skipped when its time comes.
    pub fn cancel(&mut self, key: EventKey) {
        self.cancelled.insert(key.0);
    }

    /// Pops the next live event due at or before `until`, advancing the clock
    /// to its timestamp.
    pub fn pop_until(&mut self, until: SimTime) -> Option<E> {
        loop {
            let next_at = self.queue.peek()?.0.at;
            if next_at > until {
                return None;
            }
            let Reverse(item) = self.queue.pop()?;
            if self.cancelled.remove(&item.seq) {
                trace!(seq = item.seq, "skip cancelled event");
                continue;
            }
            self.now = item.at;
            return Some(item.event);
        }
    }

    pub fn pop(&mut self) -> Option<E> {
        self.pop_until(SimTime(f64::INFINITY))
    }

    pub fn advance_to(&mut self, at: SimTime) {
        self.now = self.now.max(at);
    }

    pub fn pending(&self) -> usize {
        self.queue.len().saturating_sub(self.cancelled.len())
    }
}
