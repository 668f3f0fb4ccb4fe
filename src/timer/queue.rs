//! Deadline-ordered timer storage shared by the bundled facilities.

use super::{TimerCallback, TimerId};
use crate::utils::slab::{Key, Slab};

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Instant;

struct Entry {
    callback: Option<TimerCallback>,
    // Sequence number of the heap record that currently arms this entry.
    armed: Option<u64>,
}

/// Heap records at or below this count are never compacted.
const COMPACT_FLOOR: usize = 64;

/// Arena of timers plus a min-heap of their deadlines.
///
/// Re-arming or closing a timer leaves its old heap record in place; records whose sequence
/// number no longer matches the entry are skipped when they reach the top. Once stale
/// records make up more than half of the heap it is rebuilt without them.
pub(crate) struct TimerQueue {
    entries: Slab<Entry>,
    heap: BinaryHeap<Reverse<(Instant, u64, Key)>>,
    sequence: u64,
    stale: usize,
}

impl TimerQueue {
    pub(crate) fn new() -> Self {
        Self {
            entries: Slab::new(),
            heap: BinaryHeap::new(),
            sequence: 0,
            stale: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn insert(&mut self, callback: TimerCallback) -> TimerId {
        TimerId(self.entries.insert(Entry {
            callback: Some(callback),
            armed: None,
        }))
    }

    /// Arms `id` for `at`. Returns false if the timer is closed or has already fired.
    pub(crate) fn arm(&mut self, id: TimerId, at: Instant) -> bool {
        let Some(entry) = self.entries.get_mut(id.0) else {
            return false;
        };

        if entry.callback.is_none() {
            return false;
        }

        self.sequence += 1;
        if entry.armed.replace(self.sequence).is_some() {
            self.stale += 1;
        }
        self.heap.push(Reverse((at, self.sequence, id.0)));
        self.compact();

        true
    }

    /// Releases `id`, dropping its callback if it never fired.
    pub(crate) fn remove(&mut self, id: TimerId) -> bool {
        let Some(entry) = self.entries.remove(id.0) else {
            return false;
        };

        if entry.armed.is_some() {
            self.stale += 1;
            self.compact();
        }

        true
    }

    /// Earliest live deadline, discarding stale heap records on the way.
    pub(crate) fn next_deadline(&mut self) -> Option<Instant> {
        while let Some(&Reverse((at, sequence, key))) = self.heap.peek() {
            if self.is_current(sequence, key) {
                return Some(at);
            }
            self.heap.pop();
            self.stale = self.stale.saturating_sub(1);
        }

        None
    }

    /// Takes the callbacks of every timer due at `now`, earliest deadline first.
    ///
    /// Fired timers stay allocated until they are closed.
    pub(crate) fn pop_due(&mut self, now: Instant) -> Vec<TimerCallback> {
        let mut due = Vec::new();

        while let Some(&Reverse((at, sequence, key))) = self.heap.peek() {
            if at > now {
                break;
            }
            self.heap.pop();

            match self.entries.get_mut(key) {
                Some(entry) if entry.armed == Some(sequence) => {
                    entry.armed = None;
                    if let Some(callback) = entry.callback.take() {
                        due.push(callback);
                    }
                }
                _ => self.stale = self.stale.saturating_sub(1),
            }
        }

        due
    }

    /// Number of timers currently armed and not yet fired.
    pub(crate) fn armed(&self) -> usize {
        self.heap
            .iter()
            .filter(|Reverse((_, sequence, key))| self.is_current(*sequence, *key))
            .count()
    }

    /// Drops every timer, returning how many were still allocated.
    pub(crate) fn clear(&mut self) -> usize {
        self.heap.clear();
        self.stale = 0;
        self.entries.drain().len()
    }

    fn compact(&mut self) {
        if self.heap.len() <= COMPACT_FLOOR || self.stale * 2 <= self.heap.len() {
            return;
        }

        let entries = &self.entries;
        self.heap.retain(|Reverse((_, sequence, key))| {
            entries
                .get(*key)
                .is_some_and(|entry| entry.armed == Some(*sequence))
        });
        self.stale = 0;
    }

    fn is_current(&self, sequence: u64, key: Key) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| entry.armed == Some(sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting(counter: &Arc<AtomicUsize>) -> TimerCallback {
        let counter = counter.clone();
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn pops_in_deadline_order_and_only_once() {
        let now = Instant::now();
        let mut queue = TimerQueue::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for (label, offset) in [("late", 30u64), ("early", 10), ("middle", 20)] {
            let order = order.clone();
            let id = queue.insert(Box::new(move || order.lock().push(label)));
            queue.arm(id, now + Duration::from_millis(offset));
        }

        for callback in queue.pop_due(now + Duration::from_millis(25)) {
            callback();
        }
        assert_eq!(*order.lock(), vec!["early", "middle"]);

        for callback in queue.pop_due(now + Duration::from_millis(100)) {
            callback();
        }
        assert!(queue.pop_due(now + Duration::from_secs(1)).is_empty());
        assert_eq!(*order.lock(), vec!["early", "middle", "late"]);
    }

    #[test]
    fn rearm_replaces_previous_deadline() {
        let now = Instant::now();
        let fired = Arc::new(AtomicUsize::new(0));
        let mut queue = TimerQueue::new();

        let id = queue.insert(counting(&fired));
        queue.arm(id, now + Duration::from_millis(5));
        queue.arm(id, now + Duration::from_millis(50));

        assert_eq!(queue.next_deadline(), Some(now + Duration::from_millis(50)));
        assert!(queue.pop_due(now + Duration::from_millis(10)).is_empty());
        assert_eq!(queue.armed(), 1);
    }

    #[test]
    fn removed_timer_never_fires() {
        let now = Instant::now();
        let fired = Arc::new(AtomicUsize::new(0));
        let mut queue = TimerQueue::new();

        let id = queue.insert(counting(&fired));
        queue.arm(id, now);
        assert!(queue.remove(id));
        assert!(!queue.remove(id));

        assert!(queue.pop_due(now + Duration::from_secs(1)).is_empty());
        assert_eq!(queue.next_deadline(), None);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn fired_timer_stays_allocated_until_removed() {
        let now = Instant::now();
        let fired = Arc::new(AtomicUsize::new(0));
        let mut queue = TimerQueue::new();

        let id = queue.insert(counting(&fired));
        queue.arm(id, now);
        assert_eq!(queue.pop_due(now).len(), 1);

        assert_eq!(queue.len(), 1);
        assert!(!queue.arm(id, now));
        assert!(queue.remove(id));
    }

    #[test]
    fn cancelled_timers_do_not_pile_up_behind_a_live_one() {
        let now = Instant::now();
        let mut queue = TimerQueue::new();

        let live = queue.insert(Box::new(|| {}));
        queue.arm(live, now + Duration::from_secs(1));

        for _ in 0..10_000 {
            let id = queue.insert(Box::new(|| {}));
            queue.arm(id, now + Duration::from_secs(3600));
            queue.remove(id);
        }

        assert!(queue.heap.len() <= 2 * COMPACT_FLOOR, "heap holds {}", queue.heap.len());
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.armed(), 1);
        assert_eq!(queue.next_deadline(), Some(now + Duration::from_secs(1)));
    }

    #[test]
    fn repeated_rearm_keeps_heap_bounded() {
        let now = Instant::now();
        let mut queue = TimerQueue::new();
        let id = queue.insert(Box::new(|| {}));

        for offset in 0..1_000u64 {
            queue.arm(id, now + Duration::from_millis(offset));
        }

        assert!(queue.heap.len() <= 2 * COMPACT_FLOOR);
        assert_eq!(queue.next_deadline(), Some(now + Duration::from_millis(999)));
        assert_eq!(queue.pop_due(now + Duration::from_secs(1)).len(), 1);
    }
}
