//! Discrete-event queue: a min-heap ordered by `(time, priority, event_id)`.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// The three event classes the kernel schedules, ordered by priority when two
/// events share a timestamp: `Start` before `End` would let a node hear its
/// own transmission begin before any in-flight reception ends at the same
/// instant, so `End` sorts first, then `Start`, then `Mobility`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Start { node_id: usize },
    End { node_id: usize },
    Mobility { node_id: usize },
}

impl EventKind {
    fn priority(&self) -> u8 {
        match self {
            EventKind::End { .. } => 0,
            EventKind::Start { .. } => 1,
            EventKind::Mobility { .. } => 2,
        }
    }
}

/// A single scheduled occurrence. Ordering is by time, then priority, then
/// insertion order (`event_id`), so the queue is a deterministic total order
/// even when two events share a timestamp and priority.
#[derive(Debug, Clone, Copy)]
pub struct ScheduledEvent {
    pub time: f64,
    pub event_id: u64,
    pub kind: EventKind,
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.event_id == other.event_id
    }
}
impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.time
            .total_cmp(&other.time)
            .then_with(|| self.kind.priority().cmp(&other.kind.priority()))
            .then_with(|| self.event_id.cmp(&other.event_id))
    }
}

/// Priority queue of pending events, with lazy removal: a cancelled event is
/// flagged in `dead` rather than removed from the heap immediately, avoiding
/// an O(n) heap rebuild per cancellation.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<ScheduledEvent>>,
    dead: std::collections::HashSet<u64>,
    next_event_id: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        EventQueue {
            heap: BinaryHeap::new(),
            dead: std::collections::HashSet::new(),
            next_event_id: 0,
        }
    }

    /// Schedules `kind` at `time`, returning the assigned event id.
    pub fn schedule(&mut self, time: f64, kind: EventKind) -> u64 {
        let event_id = self.next_event_id;
        self.next_event_id += 1;
        self.heap.push(Reverse(ScheduledEvent { time, event_id, kind }));
        event_id
    }

    /// Marks `event_id` as cancelled; it is skipped the next time it would
    /// otherwise be popped.
    pub fn cancel(&mut self, event_id: u64) {
        self.dead.insert(event_id);
    }

    /// Pops the next live event in time order, discarding any cancelled
    /// events encountered along the way.
    pub fn pop(&mut self) -> Option<ScheduledEvent> {
        while let Some(Reverse(ev)) = self.heap.pop() {
            if self.dead.remove(&ev.event_id) {
                continue;
            }
            return Some(ev);
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.heap.len() == self.dead.len()
    }

    pub fn len(&self) -> usize {
        self.heap.len().saturating_sub(self.dead.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_time_order() {
        let mut q = EventQueue::new();
        q.schedule(5.0, EventKind::Mobility { node_id: 0 });
        q.schedule(1.0, EventKind::Mobility { node_id: 0 });
        q.schedule(3.0, EventKind::Mobility { node_id: 0 });
        let times: Vec<f64> = std::iter::from_fn(|| q.pop()).map(|e| e.time).collect();
        assert_eq!(times, vec![1.0, 3.0, 5.0]);
    }

    #[test]
    fn end_before_start_before_mobility_at_same_time() {
        let mut q = EventQueue::new();
        q.schedule(1.0, EventKind::Mobility { node_id: 0 });
        q.schedule(1.0, EventKind::Start { node_id: 0 });
        q.schedule(1.0, EventKind::End { node_id: 0 });
        let kinds: Vec<EventKind> = std::iter::from_fn(|| q.pop()).map(|e| e.kind).collect();
        assert!(matches!(kinds[0], EventKind::End { .. }));
        assert!(matches!(kinds[1], EventKind::Start { .. }));
        assert!(matches!(kinds[2], EventKind::Mobility { .. }));
    }

    #[test]
    fn cancelled_event_is_skipped() {
        let mut q = EventQueue::new();
        let id = q.schedule(1.0, EventKind::Mobility { node_id: 0 });
        q.schedule(2.0, EventKind::Mobility { node_id: 0 });
        q.cancel(id);
        let ev = q.pop().unwrap();
        assert_eq!(ev.time, 2.0);
        assert!(q.pop().is_none());
    }

    #[test]
    fn is_empty_accounts_for_pending_cancellations() {
        let mut q = EventQueue::new();
        let id = q.schedule(1.0, EventKind::Mobility { node_id: 0 });
        q.cancel(id);
        assert!(q.is_empty());
        assert_eq!(q.len(), 0);
    }
}
