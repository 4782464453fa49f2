use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Handle to a scheduled timer, used for cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Cooperative, single-threaded queue of delayed events on a virtual clock.
///
/// Nothing fires on its own: the owner advances the clock with
/// [`Scheduler::advance`] and drains due events with [`Scheduler::pop_due`].
/// Events due at the same instant fire in the order they were scheduled.
#[derive(Debug)]
pub struct Scheduler<E> {
    now: Duration,
    next_id: u64,
    queue: BTreeMap<(Duration, u64), E>,
    due_at: HashMap<u64, Duration>,
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Scheduler<E> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 0,
            queue: BTreeMap::new(),
            due_at: HashMap::new(),
        }
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Schedule `event` to fire `after` from now
    pub fn schedule(&mut self, after: Duration, event: E) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;

        let due = self.now + after;
        self.queue.insert((due, id), event);
        self.due_at.insert(id, due);
        TimerId(id)
    }

    /// Cancel a pending timer. Returns false if it already fired or never existed.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.due_at.remove(&id.0) {
            Some(due) => self.queue.remove(&(due, id.0)).is_some(),
            None => false,
        }
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.due_at.contains_key(&id.0)
    }

    /// Move the clock forward
    pub fn advance(&mut self, delta: Duration) {
        self.now += delta;
    }

    /// Move the clock to `deadline` if it is in the future
    pub fn advance_to(&mut self, deadline: Duration) {
        self.now = self.now.max(deadline);
    }

    /// Remove and return the earliest event that is due at or before now
    pub fn pop_due(&mut self) -> Option<(TimerId, E)> {
        let (&(due, id), _) = self.queue.first_key_value()?;
        if due > self.now {
            return None;
        }
        self.due_at.remove(&id);
        self.queue.remove(&(due, id)).map(|event| (TimerId(id), event))
    }

    /// Pop the earliest event due at or before `deadline`, moving the clock to
    /// its due time so that anything it schedules is relative to that instant.
    pub fn pop_before(&mut self, deadline: Duration) -> Option<(TimerId, E)> {
        let &(due, _) = self.queue.keys().next()?;
        if due > deadline {
            return None;
        }
        self.now = self.now.max(due);
        self.pop_due()
    }

    /// Time at which the next pending event is due
    pub fn next_due(&self) -> Option<Duration> {
        self.queue.keys().next().map(|&(due, _)| due)
    }

    /// Drop every pending event
    pub fn clear(&mut self) {
        self.queue.clear();
        self.due_at.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
