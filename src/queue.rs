use std::cmp::Reverse;

use log::trace;
use ordered_float::OrderedFloat;
use priority_queue::PriorityQueue;

use crate::ball::Ball;
use crate::events::{Event, EventKind};

/// Event queue ordered by firing time, earliest first. Stale events stay in
/// the heap until they surface; `pop_next_valid` reaps them lazily.
pub struct EventQueue<const D: usize> {
    heap: PriorityQueue<Event<D>, Reverse<(OrderedFloat<f64>, u64)>>,
    next_seq: u64,
    discarded: u64,
}

impl<const D: usize> EventQueue<D> {
    pub fn new() -> Self {
        EventQueue {
            heap: PriorityQueue::new(),
            next_seq: 0,
            discarded: 0,
        }
    }

    /// Stamp the event with the next sequence number and enqueue it.
    pub fn push(&mut self, time: f64, kind: EventKind<D>) -> Event<D> {
        let event = Event {
            seq: self.next_seq,
            time,
            kind,
        };
        self.next_seq += 1;
        self.heap.push(event, event.priority());
        event
    }

    /// Earliest event whose participants are all unchanged since prediction.
    /// Stale tops are dropped on the way.
    pub fn pop_next_valid(&mut self, balls: &[Ball<D>]) -> Option<Event<D>> {
        while let Some((event, _)) = self.heap.pop() {
            if event.is_valid(balls) {
                return Some(event);
            }
            self.discarded += 1;
            trace!("discarded stale event {:?}", event);
        }
        None
    }

    /// Still-truthful entries naming the ball: exactly the events a
    /// generation bump on it would invalidate.
    pub fn pending_for(&self, balls: &[Ball<D>], index: usize) -> usize {
        self.heap
            .iter()
            .filter(|(event, _)| event.mentions(index) && event.is_valid(balls))
            .count()
    }

    /// Entry count, stale entries included.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}

impl<const D: usize> Default for EventQueue<D> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::BallHandle;
    use nalgebra::Vector2;

    fn ball(index: usize) -> Ball<2> {
        Ball::new(index, Vector2::zeros(), Vector2::zeros(), 0.4, [0, 0])
    }

    #[test]
    fn pops_in_time_order() {
        let balls = vec![ball(0)];
        let mut queue: EventQueue<2> = EventQueue::new();
        queue.push(3.0, EventKind::Export);
        queue.push(1.0, EventKind::End);
        queue.push(2.0, EventKind::Export);
        let times: Vec<f64> = std::iter::from_fn(|| queue.pop_next_valid(&balls))
            .map(|e| e.time)
            .collect();
        assert_eq!(times, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn equal_times_pop_in_push_order() {
        let balls = vec![ball(0)];
        let mut queue: EventQueue<2> = EventQueue::new();
        let first = queue.push(1.0, EventKind::Export);
        let second = queue.push(1.0, EventKind::End);
        assert_eq!(queue.pop_next_valid(&balls).unwrap().seq, first.seq);
        assert_eq!(queue.pop_next_valid(&balls).unwrap().seq, second.seq);
    }

    #[test]
    fn stale_events_are_skipped_and_counted() {
        let mut balls = vec![ball(0), ball(1)];
        let mut queue: EventQueue<2> = EventQueue::new();
        queue.push(
            1.0,
            EventKind::BallBall {
                first: BallHandle::of(&balls[0]),
                second: BallHandle::of(&balls[1]),
            },
        );
        queue.push(
            2.0,
            EventKind::BallWall {
                ball: BallHandle::of(&balls[1]),
                wall: 0,
            },
        );
        queue.push(3.0, EventKind::End);
        assert_eq!(queue.len(), 3);

        // Any velocity change on ball 1 invalidates both of its events.
        balls[1].bump_generation();
        let event = queue.pop_next_valid(&balls).unwrap();
        assert!(matches!(event.kind, EventKind::End));
        assert_eq!(queue.discarded(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn pending_for_counts_only_valid_mentions() {
        let mut balls = vec![ball(0), ball(1)];
        let mut queue: EventQueue<2> = EventQueue::new();
        queue.push(
            1.0,
            EventKind::BallBall {
                first: BallHandle::of(&balls[0]),
                second: BallHandle::of(&balls[1]),
            },
        );
        queue.push(
            2.0,
            EventKind::GridTransit {
                ball: BallHandle::of(&balls[0]),
                new_cell: [1, 0],
            },
        );
        queue.push(3.0, EventKind::Export);
        assert_eq!(queue.pending_for(&balls, 0), 2);
        assert_eq!(queue.pending_for(&balls, 1), 1);

        balls[0].bump_generation();
        assert_eq!(queue.pending_for(&balls, 0), 0);
        // The pair event went stale for ball 1 as well.
        assert_eq!(queue.pending_for(&balls, 1), 0);
    }

    #[test]
    fn transit_events_stay_valid_until_generation_changes() {
        let mut balls = vec![ball(0)];
        let mut queue: EventQueue<2> = EventQueue::new();
        queue.push(
            1.0,
            EventKind::GridTransit {
                ball: BallHandle::of(&balls[0]),
                new_cell: [1, 0],
            },
        );
        assert!(queue.pop_next_valid(&balls).is_some());

        queue.push(
            2.0,
            EventKind::GridTransit {
                ball: BallHandle::of(&balls[0]),
                new_cell: [2, 0],
            },
        );
        balls[0].bump_generation();
        assert!(queue.pop_next_valid(&balls).is_none());
    }
}
