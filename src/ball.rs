use nalgebra::SVector;

/// Uniform gravity, magnitude 1 along -y in scaled units. Zero when disabled.
pub fn gravity_vector<const D: usize>(enabled: bool) -> SVector<f64, D> {
    let mut g = SVector::<f64, D>::zeros();
    if enabled {
        g[1] = -1.0;
    }
    g
}

/// A mobile body. `position` and `velocity` are exact at the ball's own local
/// time `time`; any later state comes from the kinematic law in `peek`.
#[derive(Clone, Debug, PartialEq)]
pub struct Ball<const D: usize> {
    pub index: usize,
    pub position: SVector<f64, D>,
    pub velocity: SVector<f64, D>,
    pub radius: f64,
    /// Grid cell currently owning this ball; floor of position, clamped.
    pub cell: [usize; D],
    /// Local time at which position/velocity are exact.
    pub time: f64,
    /// Bumped on every velocity change. Queued events snapshot it; a stale
    /// snapshot marks the event invalid.
    pub generation: u64,
}

impl<const D: usize> Ball<D> {
    pub fn new(
        index: usize,
        position: SVector<f64, D>,
        velocity: SVector<f64, D>,
        radius: f64,
        cell: [usize; D],
    ) -> Self {
        Ball {
            index,
            position,
            velocity,
            radius,
            cell,
            time: 0.0,
            generation: 0,
        }
    }

    /// State at `t >= self.time` without mutating the ball.
    ///
    /// Panics on past-time requests; that is always a scheduler bug.
    pub fn peek(&self, t: f64, gravity: bool) -> (SVector<f64, D>, SVector<f64, D>) {
        let dt = t - self.time;
        assert!(
            dt >= 0.0,
            "ball {} evaluated at t={} before its local time {}",
            self.index,
            t,
            self.time
        );
        let g = gravity_vector::<D>(gravity);
        let position = self.position + self.velocity * dt + g * (0.5 * dt * dt);
        let velocity = self.velocity + g * dt;
        (position, velocity)
    }

    /// Move the stored state forward to `t`.
    pub fn advance(&mut self, t: f64, gravity: bool) {
        let (position, velocity) = self.peek(t, gravity);
        self.position = position;
        self.velocity = velocity;
        self.time = t;
    }

    /// Invalidate every queued event naming this ball. Call after any
    /// velocity mutation, never on a plain cell transit.
    pub fn bump_generation(&mut self) {
        self.generation += 1;
    }
}
