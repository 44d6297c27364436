//! A deterministic, cycle-ordered event scheduler.
//!
//! Every future action in the machine — a VBL edge, a keyboard-injection
//! step, a trap return — is a scheduled event rather than something polled
//! on every tick. Events fire in `(cycle, priority, insertion order)` order,
//! which is what lets two machines fed the same inputs produce bit-identical
//! output regardless of how many devices happen to be wired up.
//!
//! Event kinds are a plain, `Copy` enum supplied by the caller (typically the
//! machine crate), not a boxed closure: the heap holds only cheap tagged
//! values, and dispatch happens through a handler the caller drives, so the
//! hot path never allocates.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use emu_core::Cycle;

/// Dispatch priority for events scheduled at the same cycle. Lower values
/// run first.
pub type Priority = u8;

/// A handle to a previously scheduled event, usable with [`Scheduler::cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventHandle(u64);

struct Entry<K> {
    cycle: Cycle,
    priority: Priority,
    seq: u64,
    kind: K,
}

impl<K> PartialEq for Entry<K> {
    fn eq(&self, other: &Self) -> bool {
        self.cycle == other.cycle && self.priority == other.priority && self.seq == other.seq
    }
}

impl<K> Eq for Entry<K> {}

impl<K> PartialOrd for Entry<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for Entry<K> {
    /// `BinaryHeap` is a max-heap; reverse the natural `(cycle, priority, seq)`
    /// order so the *smallest* tuple always pops first.
    fn cmp(&self, other: &Self) -> Ordering {
        (other.cycle, other.priority, other.seq).cmp(&(self.cycle, self.priority, self.seq))
    }
}

/// A deterministic priority-queue scheduler keyed on cycle count.
pub struct Scheduler<K> {
    now: Cycle,
    heap: BinaryHeap<Entry<K>>,
    cancelled: HashSet<u64>,
    next_seq: u64,
}

impl<K> Default for Scheduler<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Scheduler<K> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: Cycle::ZERO,
            heap: BinaryHeap::new(),
            cancelled: HashSet::new(),
            next_seq: 0,
        }
    }

    /// The scheduler's current cycle count.
    #[must_use]
    pub fn now(&self) -> Cycle {
        self.now
    }

    /// Number of live (non-cancelled) events still in the queue.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.heap.len() - self.cancelled.len()
    }

    /// Schedule `kind` to fire at an absolute cycle.
    ///
    /// `cycle` must be `>= now()`; scheduling into the past would violate the
    /// invariant that every queued event has `cycle >= now` and is rejected
    /// by clamping to `now()`.
    pub fn schedule_at(&mut self, cycle: Cycle, priority: Priority, kind: K) -> EventHandle {
        let cycle = if cycle < self.now { self.now } else { cycle };
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry {
            cycle,
            priority,
            seq,
            kind,
        });
        EventHandle(seq)
    }

    /// Schedule `kind` to fire `delta` cycles from now.
    pub fn schedule_after(&mut self, delta: u64, priority: Priority, kind: K) -> EventHandle {
        self.schedule_at(self.now + delta, priority, kind)
    }

    /// Cancel a previously scheduled event. A no-op if it already fired or
    /// was already cancelled. The entry is not removed from the heap eagerly
    /// — it is skipped when its turn to fire comes up.
    pub fn cancel(&mut self, handle: EventHandle) {
        self.cancelled.insert(handle.0);
    }

    /// Empty the queue and reset `now` to zero.
    pub fn reset(&mut self) {
        self.heap.clear();
        self.cancelled.clear();
        self.now = Cycle::ZERO;
        self.next_seq = 0;
    }

    /// Advance `now` by `delta` cycles, firing every due event in
    /// `(cycle, priority, insertion)` order along the way.
    ///
    /// `dispatch` is invoked once per fired event with the scheduler itself
    /// (so handlers may reschedule or cancel other events) and the event's
    /// cycle and kind. An event rescheduled by a handler to the same cycle
    /// it fired at, at a priority that would also be due, runs only on a
    /// *later* call to `advance` or after the handler returns — the
    /// insertion sequence always sorts it behind everything already queued.
    pub fn advance(&mut self, delta: u64, mut dispatch: impl FnMut(&mut Self, Cycle, K)) {
        let target = self.now + delta;
        loop {
            let due = matches!(self.heap.peek(), Some(entry) if entry.cycle <= target);
            if !due {
                break;
            }
            // Safe: we just confirmed `peek()` is `Some`.
            let entry = self.heap.pop().expect("peeked entry must still be present");
            if self.cancelled.remove(&entry.seq) {
                continue;
            }
            self.now = entry.cycle;
            dispatch(self, entry.cycle, entry.kind);
        }
        self.now = target;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Kind {
        A,
        B,
        Reschedule,
    }

    #[test]
    fn fires_in_cycle_priority_insertion_order() {
        let mut sched: Scheduler<Kind> = Scheduler::new();
        sched.schedule_at(Cycle::new(5), 1, Kind::B);
        sched.schedule_at(Cycle::new(5), 0, Kind::A);
        sched.schedule_at(Cycle::new(3), 0, Kind::A);

        let mut order = Vec::new();
        sched.advance(10, |_, cycle, kind| order.push((cycle.get(), kind)));

        assert_eq!(
            order,
            vec![
                (3, Kind::A),
                (5, Kind::A),
                (5, Kind::B),
            ]
        );
    }

    #[test]
    fn cancelled_events_are_skipped() {
        let mut sched: Scheduler<Kind> = Scheduler::new();
        let handle = sched.schedule_at(Cycle::new(2), 0, Kind::A);
        sched.schedule_at(Cycle::new(4), 0, Kind::B);
        sched.cancel(handle);

        let mut fired = Vec::new();
        sched.advance(10, |_, _, kind| fired.push(kind));

        assert_eq!(fired, vec![Kind::B]);
    }

    #[test]
    fn now_never_precedes_queued_events() {
        let mut sched: Scheduler<Kind> = Scheduler::new();
        sched.advance(5, |_, _, _| {});
        assert_eq!(sched.now(), Cycle::new(5));
        // Scheduling "in the past" clamps to now rather than going backwards.
        sched.schedule_at(Cycle::new(0), 0, Kind::A);
        let mut fired_at = None;
        sched.advance(1, |_, cycle, _| fired_at = Some(cycle));
        assert_eq!(fired_at, Some(Cycle::new(5)));
    }

    #[test]
    fn reentrant_reschedule_runs_after_currently_queued_peers() {
        let mut sched: Scheduler<Kind> = Scheduler::new();
        sched.schedule_at(Cycle::new(1), 0, Kind::Reschedule);
        sched.schedule_at(Cycle::new(1), 0, Kind::A);

        let mut order = Vec::new();
        sched.advance(1, |s, cycle, kind| {
            order.push(kind);
            if kind == Kind::Reschedule {
                s.schedule_at(cycle, 0, Kind::B);
            }
        });

        assert_eq!(order, vec![Kind::Reschedule, Kind::A, Kind::B]);
    }

    #[test]
    fn reset_empties_queue_and_zeroes_now() {
        let mut sched: Scheduler<Kind> = Scheduler::new();
        sched.schedule_at(Cycle::new(100), 0, Kind::A);
        sched.advance(50, |_, _, _| {});
        sched.reset();
        assert_eq!(sched.now(), Cycle::ZERO);
        assert_eq!(sched.pending(), 0);
    }
}
