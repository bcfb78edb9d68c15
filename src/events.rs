use std::cmp::Reverse;
use std::hash::{Hash, Hasher};

use ordered_float::OrderedFloat;

use crate::ball::Ball;

/// Names a ball together with the generation its event was predicted against.
/// The pair goes stale the moment the ball's velocity changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BallHandle {
    pub index: usize,
    pub generation: u64,
}

impl BallHandle {
    pub fn of<const D: usize>(ball: &Ball<D>) -> Self {
        BallHandle {
            index: ball.index,
            generation: ball.generation,
        }
    }

    pub fn is_current<const D: usize>(&self, balls: &[Ball<D>]) -> bool {
        balls[self.index].generation == self.generation
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind<const D: usize> {
    BallBall {
        first: BallHandle,
        second: BallHandle,
    },
    BallWall {
        ball: BallHandle,
        wall: usize,
    },
    /// The ball crosses into `new_cell`. Changes grid membership only; the
    /// ball's kinematic state is untouched.
    GridTransit {
        ball: BallHandle,
        new_cell: [usize; D],
    },
    /// Snapshot every ball at the event time.
    Export,
    /// Terminate the run.
    End,
}

/// A predicted future happening. Immutable once queued; validity is derived
/// from the participants' generations at pop time.
#[derive(Clone, Copy, Debug)]
pub struct Event<const D: usize> {
    /// Monotone push order; the deterministic tie-break for equal times.
    pub seq: u64,
    pub time: f64,
    pub kind: EventKind<D>,
}

impl<const D: usize> Event<D> {
    /// Truthful iff no participant's velocity changed since prediction.
    pub fn is_valid(&self, balls: &[Ball<D>]) -> bool {
        match self.kind {
            EventKind::BallBall { first, second } => {
                first.is_current(balls) && second.is_current(balls)
            }
            EventKind::BallWall { ball, .. } | EventKind::GridTransit { ball, .. } => {
                ball.is_current(balls)
            }
            EventKind::Export | EventKind::End => true,
        }
    }

    /// Whether the event names this ball as a participant.
    pub fn mentions(&self, index: usize) -> bool {
        match self.kind {
            EventKind::BallBall { first, second } => {
                first.index == index || second.index == index
            }
            EventKind::BallWall { ball, .. } | EventKind::GridTransit { ball, .. } => {
                ball.index == index
            }
            EventKind::Export | EventKind::End => false,
        }
    }

    /// Min-heap key: earliest time first, then push order.
    pub fn priority(&self) -> Reverse<(OrderedFloat<f64>, u64)> {
        Reverse((OrderedFloat(self.time), self.seq))
    }
}

// Identity is the sequence number; times are not comparable exactly and the
// queue only needs to tell entries apart.
impl<const D: usize> PartialEq for Event<D> {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl<const D: usize> Eq for Event<D> {}

impl<const D: usize> Hash for Event<D> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.seq.hash(state);
    }
}
