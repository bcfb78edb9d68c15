use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("placement error: {num_balls} balls do not fit in {capacity} cells")]
    Placement { num_balls: usize, capacity: usize },

    /// Two balls interpenetrated. This invariant must never break; hitting it
    /// means a predictor or the scheduler is wrong.
    #[error(
        "overlap between balls {first} and {second} at t={time}: \
         centers {distance} apart, minimum {minimum}"
    )]
    Overlap {
        first: usize,
        second: usize,
        time: f64,
        distance: f64,
        minimum: f64,
    },

    /// The separating-velocity guard in a resolver fired. The guard keeps a
    /// grazing contact from injecting energy, but a nonzero count means some
    /// predictor handed back a collision that was already over.
    #[error("separating-velocity guard fired {count} times during the run")]
    GrazingGuard { count: u64 },

    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}
