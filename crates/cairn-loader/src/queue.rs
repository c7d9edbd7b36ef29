//! Backlog of pending resource loads.

use cairn_core::resource::{Priority, ResourceDescriptor};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A descriptor waiting for admission.
#[derive(Debug, Clone)]
pub struct QueuedResource {
    pub descriptor: ResourceDescriptor,
    sequence: u64,
}

impl QueuedResource {
    pub fn priority(&self) -> Priority {
        self.descriptor.priority
    }
}

impl PartialEq for QueuedResource {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}

impl Eq for QueuedResource {}

impl PartialOrd for QueuedResource {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedResource {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first, then earlier enqueue
        match self.priority().cmp(&other.priority()) {
            Ordering::Equal => other.sequence.cmp(&self.sequence),
            other => other,
        }
    }
}

/// Priority backlog plus the in-flight counter it admits against.
#[derive(Debug, Default)]
pub struct LoadQueue {
    backlog: BinaryHeap<QueuedResource>,
    in_flight: usize,
    next_sequence: u64,
}

impl LoadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor to the backlog.
    pub fn enqueue(&mut self, descriptor: ResourceDescriptor) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.backlog.push(QueuedResource {
            descriptor,
            sequence,
        });
    }

    /// Admit descriptors, best first, until `max_in_flight` are running or
    /// the backlog is empty. Admitted descriptors count as in flight.
    pub fn admit(&mut self, max_in_flight: usize) -> Vec<ResourceDescriptor> {
        let mut admitted = Vec::new();
        while self.in_flight < max_in_flight {
            let Some(next) = self.backlog.pop() else {
                break;
            };
            self.in_flight += 1;
            admitted.push(next.descriptor);
        }
        admitted
    }

    /// Mark one in-flight load as finished, freeing its slot.
    pub fn complete(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// Drop every waiting descriptor. In-flight loads are unaffected.
    pub fn clear_backlog(&mut self) -> usize {
        let dropped = self.backlog.len();
        self.backlog.clear();
        dropped
    }

    /// Number of descriptors waiting for admission.
    pub fn len(&self) -> usize {
        self.backlog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backlog.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::resource::ResourceKind;

    fn descriptor(id: &str, priority: Priority) -> ResourceDescriptor {
        ResourceDescriptor::new(id, ResourceKind::Image, format!("https://cdn.test/{}.png", id))
            .with_priority(priority)
    }

    fn ids(descriptors: &[ResourceDescriptor]) -> Vec<&str> {
        descriptors.iter().map(|d| d.id.as_str()).collect()
    }

    #[test]
    fn test_priority_ordering() {
        let mut queue = LoadQueue::new();
        queue.enqueue(descriptor("low", Priority::Low));
        queue.enqueue(descriptor("critical", Priority::Critical));
        queue.enqueue(descriptor("medium", Priority::Medium));

        let mut order = Vec::new();
        for _ in 0..3 {
            let admitted = queue.admit(1);
            order.extend(admitted);
            queue.complete();
        }
        assert_eq!(ids(&order), vec!["critical", "medium", "low"]);
    }

    #[test]
    fn test_fifo_within_tier() {
        let mut queue = LoadQueue::new();
        for id in ["a", "b", "c"] {
            queue.enqueue(descriptor(id, Priority::High));
        }
        queue.enqueue(descriptor("d", Priority::Low));
        queue.enqueue(descriptor("e", Priority::High));

        let admitted = queue.admit(usize::MAX);
        assert_eq!(ids(&admitted), vec!["a", "b", "c", "e", "d"]);
    }

    #[test]
    fn test_admission_respects_cap() {
        let mut queue = LoadQueue::new();
        for i in 0..5 {
            queue.enqueue(descriptor(&format!("r{}", i), Priority::Medium));
        }

        assert_eq!(queue.admit(2).len(), 2);
        assert!(queue.admit(2).is_empty());
        assert_eq!(queue.in_flight(), 2);
        assert_eq!(queue.len(), 3);

        queue.complete();
        let next = queue.admit(2);
        assert_eq!(ids(&next), vec!["r2"]);
        assert_eq!(queue.in_flight(), 2);
    }

    #[test]
    fn test_no_preemption_of_in_flight() {
        let mut queue = LoadQueue::new();
        queue.enqueue(descriptor("slow", Priority::Low));
        assert_eq!(queue.admit(1).len(), 1);

        queue.enqueue(descriptor("urgent", Priority::Critical));
        assert!(queue.admit(1).is_empty());
        assert_eq!(queue.len(), 1);

        queue.complete();
        assert_eq!(ids(&queue.admit(1)), vec!["urgent"]);
    }

    #[test]
    fn test_clear_backlog_keeps_in_flight() {
        let mut queue = LoadQueue::new();
        for i in 0..4 {
            queue.enqueue(descriptor(&format!("r{}", i), Priority::Medium));
        }
        queue.admit(1);

        assert_eq!(queue.clear_backlog(), 3);
        assert!(queue.is_empty());
        assert_eq!(queue.in_flight(), 1);
    }
}
