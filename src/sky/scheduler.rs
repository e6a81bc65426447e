//! Deferred tasks, ordered by fire time and then by scheduling order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

struct Entry<T> {
    fire_at: f64,
    seq: u64,
    task: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    // Reversed: BinaryHeap is a max-heap and we want the earliest entry on top
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .fire_at
            .total_cmp(&self.fire_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

pub struct Scheduler<T> {
    queue: BinaryHeap<Entry<T>>,
    next_seq: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            queue: BinaryHeap::new(),
            next_seq: 0,
        }
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `task` to fire once the clock reaches `fire_at` (ms).
    pub fn schedule(&mut self, fire_at: f64, task: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Entry { fire_at, seq, task });
    }

    /// Removes and returns the earliest task due at or before `now`.
    pub fn pop_due(&mut self, now: f64) -> Option<T> {
        if self.queue.peek()?.fire_at > now {
            return None;
        }
        self.queue.pop().map(|entry| entry.task)
    }

    #[cfg(test)]
    pub fn next_fire_time(&self) -> Option<f64> {
        self.queue.peek().map(|entry| entry.fire_at)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
