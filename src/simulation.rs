use log::{debug, error, info, warn};
use nalgebra::SVector;
use serde_json::json;

use crate::ball::Ball;
use crate::collision::colliders::{collide_ball_ball, collide_ball_wall};
use crate::collision::solvers::{
    ball_ball_collision_time, ball_wall_collision_time, grid_transit_time,
};
use crate::config::SimulationConfig;
use crate::error::SimulationError;
use crate::events::{BallHandle, EventKind};
use crate::grid::{Grid, CELL_SIZE};
use crate::output::OutputWriter;
use crate::queue::EventQueue;
use crate::wall::{create_box_walls, Wall};
use crate::world_gen::place_balls;

/// Two peeked centers may come this much closer than touching before the
/// overlap detector calls the run broken.
const OVERLAP_TOLERANCE: f64 = 1e-9;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub events_processed: u64,
    pub ball_ball_collisions: u64,
    pub ball_wall_collisions: u64,
    pub grid_transits: u64,
    pub exports: u64,
    /// Separating-velocity guard invocations; any nonzero value fails the run.
    pub grazing_guard_hits: u64,
}

/// The event-driven scheduler. Owns every piece of mutable state — balls,
/// walls, grid, queue, output — and processes events in strict time order.
pub struct Simulation<const D: usize> {
    config: SimulationConfig,
    gravity: bool,
    balls: Vec<Ball<D>>,
    walls: Vec<Wall>,
    grid: Grid<D>,
    queue: EventQueue<D>,
    output: OutputWriter,
    current_time: f64,
    finished: bool,
    stats: RunStats,
}

impl<const D: usize> Simulation<D> {
    /// Build a run from the standard placement policy: balls centered in
    /// distinct cells, velocities drawn from the seeded RNG.
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        let domain = domain_array::<D>(&config)?;
        let mut grid = Grid::new(&domain);
        let balls = place_balls(&config, &mut grid)?;
        Self::assemble(config, domain, grid, balls)
    }

    /// Build a run from explicit initial states instead of the placement
    /// policy. Cells are derived from the positions.
    pub fn with_initial_state(
        config: SimulationConfig,
        states: &[(SVector<f64, D>, SVector<f64, D>)],
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        if states.len() != config.num_balls {
            return Err(SimulationError::Config(format!(
                "{} initial states for num_balls={}",
                states.len(),
                config.num_balls
            )));
        }
        let domain = domain_array::<D>(&config)?;
        let mut grid = Grid::new(&domain);
        let mut balls = Vec::with_capacity(states.len());
        for (index, (position, velocity)) in states.iter().enumerate() {
            let mut cell = grid.position_to_cell(position);
            // A ball sitting exactly on a cell face and heading into the
            // lower cell starts there; the flooring convention would put it
            // in the upper cell, where the face crossing at τ=0 is inside
            // the epsilon reject and the ball would be stranded.
            for axis in 0..D {
                if cell[axis] > 0
                    && position[axis] == cell[axis] as f64 * CELL_SIZE
                    && velocity[axis] < 0.0
                {
                    cell[axis] -= 1;
                }
            }
            grid.insert(index, cell);
            balls.push(Ball::new(index, *position, *velocity, config.ball_radius, cell));
        }
        Self::assemble(config, domain, grid, balls)
    }

    fn assemble(
        config: SimulationConfig,
        domain: [f64; D],
        grid: Grid<D>,
        balls: Vec<Ball<D>>,
    ) -> Result<Self, SimulationError> {
        let walls = create_box_walls(&domain, config.wall_restitution);
        let output = OutputWriter::create(&config.output_dir, &config.run_name)?;
        output.write_parameters(&config)?;
        Ok(Simulation {
            gravity: config.gravity,
            config,
            balls,
            walls,
            grid,
            queue: EventQueue::new(),
            output,
            current_time: 0.0,
            finished: false,
            stats: RunStats::default(),
        })
    }

    pub fn balls(&self) -> &[Ball<D>] {
        &self.balls
    }

    pub fn grid(&self) -> &Grid<D> {
        &self.grid
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Process events until the end event fires or the queue drains. An empty
    /// queue before the end event counts as completion.
    pub fn run(&mut self) -> Result<RunStats, SimulationError> {
        self.schedule_initial_events();
        info!(
            "{}",
            json!({
                "event_type": "SimulationStart",
                "balls": self.balls.len(),
                "walls": self.walls.len(),
                "gravity": self.gravity,
                "target_time": self.config.simulation_time,
                "initial_queue_size": self.queue.len(),
            })
        );

        while !self.finished {
            let Some(event) = self.queue.pop_next_valid(&self.balls) else {
                break;
            };
            // The clock only moves forward; the heap guarantees it.
            self.current_time = event.time;
            self.stats.events_processed += 1;
            debug!(
                "{}",
                json!({
                    "event_type": "ProcessingEvent",
                    "time": event.time,
                    "seq": event.seq,
                    "kind": format!("{:?}", event.kind),
                })
            );

            match event.kind {
                EventKind::BallBall { first, second } => {
                    self.handle_ball_ball(first.index, second.index)
                }
                EventKind::BallWall { ball, wall } => self.handle_ball_wall(ball.index, wall),
                EventKind::GridTransit { ball, new_cell } => {
                    self.handle_transit(ball.index, new_cell)
                }
                EventKind::Export => self.handle_export()?,
                EventKind::End => self.finished = true,
            }
        }

        info!(
            "{}",
            json!({
                "event_type": "SimulationComplete",
                "events_processed": self.stats.events_processed,
                "ball_ball": self.stats.ball_ball_collisions,
                "ball_wall": self.stats.ball_wall_collisions,
                "transits": self.stats.grid_transits,
                "exports": self.stats.exports,
                "queue_size": self.queue.len(),
                "discarded": self.queue.discarded(),
                "final_time": self.current_time,
            })
        );

        if self.stats.grazing_guard_hits > 0 {
            return Err(SimulationError::GrazingGuard {
                count: self.stats.grazing_guard_hits,
            });
        }
        Ok(self.stats)
    }

    /// Seed the queue: collision predictions for every ball (pairs only with
    /// strictly greater ids, so each pair is predicted once), one transit per
    /// ball, an export at t=0 and every period, and the end event.
    fn schedule_initial_events(&mut self) {
        for index in 0..self.balls.len() {
            let higher: Vec<usize> = self
                .grid
                .neighbors(self.balls[index].cell)
                .into_iter()
                .filter(|&other| other > index)
                .collect();
            self.predict_ball_ball(index, &higher);
            self.predict_ball_walls(index);
            self.predict_transit(index);
        }

        self.queue.push(0.0, EventKind::Export);
        let mut export_time = self.config.output_rate;
        while export_time <= self.config.simulation_time {
            self.queue.push(export_time, EventKind::Export);
            export_time += self.config.output_rate;
        }
        self.queue.push(self.config.simulation_time, EventKind::End);
    }

    fn handle_ball_ball(&mut self, first: usize, second: usize) {
        let t = self.current_time;
        let invalidated_first = self.queue.pending_for(&self.balls, first);
        let invalidated_second = self.queue.pending_for(&self.balls, second);
        let (a, b) = pair_mut(&mut self.balls, first, second);
        a.advance(t, self.gravity);
        b.advance(t, self.gravity);
        if !collide_ball_ball(a, b, self.config.ball_restitution) {
            self.stats.grazing_guard_hits += 1;
            warn!(
                "{}",
                json!({
                    "event_type": "SeparatingGuard",
                    "first": first,
                    "second": second,
                    "time": t,
                })
            );
        }
        // Everything either ball was part of is now a lie.
        a.bump_generation();
        b.bump_generation();
        self.stats.ball_ball_collisions += 1;
        debug!(
            "{}",
            json!({
                "event_type": "BallBallCollision",
                "first": first,
                "second": second,
                "time": t,
                "invalidated_first": invalidated_first,
                "invalidated_second": invalidated_second,
            })
        );

        self.regenerate_events(first);
        self.regenerate_events(second);
    }

    fn handle_ball_wall(&mut self, index: usize, wall: usize) {
        let t = self.current_time;
        let invalidated = self.queue.pending_for(&self.balls, index);
        let ball = &mut self.balls[index];
        ball.advance(t, self.gravity);
        if !collide_ball_wall(ball, &self.walls[wall]) {
            self.stats.grazing_guard_hits += 1;
            warn!(
                "{}",
                json!({
                    "event_type": "SeparatingGuard",
                    "ball": index,
                    "wall": wall,
                    "time": t,
                })
            );
        }
        ball.bump_generation();
        self.stats.ball_wall_collisions += 1;
        debug!(
            "{}",
            json!({
                "event_type": "BallWallCollision",
                "ball": index,
                "wall": wall,
                "time": t,
                "invalidated": invalidated,
            })
        );

        self.regenerate_events(index);
    }

    /// A transit never touches the ball's kinematic state, so its other
    /// predictions stay truthful. Only membership moves, and only collisions
    /// with occupants of the newly adjacent cells need predicting.
    fn handle_transit(&mut self, index: usize, new_cell: [usize; D]) {
        let old_cell = self.balls[index].cell;
        self.balls[index].cell = new_cell;
        self.grid.move_ball(index, old_cell, new_cell);
        self.stats.grid_transits += 1;

        let completed = self.complete_corner_crossing(index, new_cell);
        let incoming = self.grid.incoming_neighbors(old_cell, new_cell);
        self.predict_ball_ball(index, &incoming);
        if !completed {
            self.predict_transit(index);
        }
    }

    /// A corner hit crosses two boundaries at the same instant, but the
    /// transit predictor reports only the lowest tied axis and its epsilon
    /// reject would then drop the other crossing, stranding the ball in a
    /// stale cell. Queue the remaining single-axis step at the same time
    /// instead; its own handler predicts the next transit.
    fn complete_corner_crossing(&mut self, index: usize, new_cell: [usize; D]) -> bool {
        let (position, velocity) = self.balls[index].peek(self.current_time, self.gravity);
        let actual = self.grid.position_to_cell(&position);
        for axis in 0..D {
            let step = actual[axis] as isize - new_cell[axis] as isize;
            // Only a crossing the motion actually carries the ball over
            // counts; sitting exactly on a boundary while moving away from
            // it (or tangent to it) is not a transit.
            if step == 0 || step.signum() as f64 * velocity[axis] <= 0.0 {
                continue;
            }
            let mut next = new_cell;
            next[axis] = (new_cell[axis] as isize + step.signum()) as usize;
            self.queue.push(
                self.current_time,
                EventKind::GridTransit {
                    ball: BallHandle::of(&self.balls[index]),
                    new_cell: next,
                },
            );
            return true;
        }
        false
    }

    fn handle_export(&mut self) -> Result<(), SimulationError> {
        let t = self.current_time;
        let states: Vec<_> = self
            .balls
            .iter()
            .map(|ball| ball.peek(t, self.gravity))
            .collect();
        self.check_overlaps(&states, t)?;
        self.output.write_frame(t, &states)?;
        self.stats.exports += 1;
        Ok(())
    }

    /// Full re-prediction for one ball: collisions against the whole 3^D
    /// neighborhood, every wall, and the next cell transit.
    fn regenerate_events(&mut self, index: usize) {
        let neighbors = self.grid.neighbors(self.balls[index].cell);
        self.predict_ball_ball(index, &neighbors);
        self.predict_ball_walls(index);
        self.predict_transit(index);
    }

    fn predict_ball_ball(&mut self, index: usize, others: &[usize]) {
        let t = self.current_time;
        for &other in others {
            if other == index {
                continue;
            }
            let Some(time) =
                ball_ball_collision_time(&self.balls[index], &self.balls[other], t, self.gravity)
            else {
                continue;
            };
            self.queue.push(
                time,
                EventKind::BallBall {
                    first: BallHandle::of(&self.balls[index]),
                    second: BallHandle::of(&self.balls[other]),
                },
            );
        }
    }

    fn predict_ball_walls(&mut self, index: usize) {
        let t = self.current_time;
        for (wall_index, wall) in self.walls.iter().enumerate() {
            let Some(time) = ball_wall_collision_time(&self.balls[index], wall, t, self.gravity)
            else {
                continue;
            };
            self.queue.push(
                time,
                EventKind::BallWall {
                    ball: BallHandle::of(&self.balls[index]),
                    wall: wall_index,
                },
            );
        }
    }

    fn predict_transit(&mut self, index: usize) {
        let t = self.current_time;
        if let Some((time, new_cell)) =
            grid_transit_time(&self.balls[index], &self.grid, t, self.gravity)
        {
            self.queue.push(
                time,
                EventKind::GridTransit {
                    ball: BallHandle::of(&self.balls[index]),
                    new_cell,
                },
            );
        }
    }

    /// Pairwise overlap check on peeked positions. A violation can only come
    /// from a scheduler or predictor defect, so it aborts the run.
    fn check_overlaps(
        &self,
        states: &[(SVector<f64, D>, SVector<f64, D>)],
        t: f64,
    ) -> Result<(), SimulationError> {
        for i in 0..states.len() {
            for j in (i + 1)..states.len() {
                let distance = (states[j].0 - states[i].0).norm();
                let minimum = self.balls[i].radius + self.balls[j].radius;
                if distance < minimum - OVERLAP_TOLERANCE {
                    error!(
                        "{}",
                        json!({
                            "event_type": "OverlapDetected",
                            "time": t,
                            "first": { "index": i, "position": states[i].0.as_slice(), "velocity": states[i].1.as_slice() },
                            "second": { "index": j, "position": states[j].0.as_slice(), "velocity": states[j].1.as_slice() },
                            "distance": distance,
                        })
                    );
                    return Err(SimulationError::Overlap {
                        first: i,
                        second: j,
                        time: t,
                        distance,
                        minimum,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Run a configured simulation, dispatching the compile-time dimension.
pub fn run(config: SimulationConfig) -> Result<RunStats, SimulationError> {
    match config.ndim {
        2 => Simulation::<2>::new(config)?.run(),
        3 => Simulation::<3>::new(config)?.run(),
        n => Err(SimulationError::Config(format!("ndim must be 2 or 3, got {n}"))),
    }
}

fn domain_array<const D: usize>(config: &SimulationConfig) -> Result<[f64; D], SimulationError> {
    config.domain_size.as_slice().try_into().map_err(|_| {
        SimulationError::Config(format!(
            "domain_size has {} entries for a {}-dimensional run",
            config.domain_size.len(),
            D
        ))
    })
}

/// Distinct mutable references to two slice elements.
fn pair_mut<T>(slice: &mut [T], i: usize, j: usize) -> (&mut T, &mut T) {
    assert_ne!(i, j);
    if i < j {
        let (head, tail) = slice.split_at_mut(j);
        (&mut head[i], &mut tail[0])
    } else {
        let (second, first) = pair_mut(slice, j, i);
        (first, second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector2;

    fn config(dir: &tempfile::TempDir, num_balls: usize) -> SimulationConfig {
        SimulationConfig {
            ndim: 2,
            num_balls,
            ball_radius: 0.4,
            domain_size: vec![6.0, 2.0],
            simulation_time: 5.0,
            gravity: false,
            ball_restitution: 1.0,
            wall_restitution: 1.0,
            output_rate: 1.0,
            random_seed: 100,
            run_name: "unit".into(),
            output_dir: dir.path().to_str().unwrap().into(),
        }
    }

    #[test]
    fn pair_mut_returns_both_orders() {
        let mut values = vec![10, 20, 30];
        {
            let (a, b) = pair_mut(&mut values, 0, 2);
            assert_eq!((*a, *b), (10, 30));
        }
        let (a, b) = pair_mut(&mut values, 2, 1);
        assert_eq!((*a, *b), (30, 20));
    }

    #[test]
    fn initial_events_cover_exports_and_end() {
        let dir = tempfile::tempdir().unwrap();
        let states = [(Vector2::new(1.0, 1.0), Vector2::zeros())];
        let mut sim = Simulation::<2>::with_initial_state(config(&dir, 1), &states).unwrap();
        sim.schedule_initial_events();
        // A stationary ball without gravity predicts nothing; the queue holds
        // exports at 0..=5 and the end event.
        assert_eq!(sim.queue.len(), 7);
    }

    #[test]
    fn stationary_scene_runs_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        let states = [
            (Vector2::new(1.0, 1.0), Vector2::zeros()),
            (Vector2::new(3.0, 1.0), Vector2::zeros()),
        ];
        let mut sim =
            Simulation::<2>::with_initial_state(config(&dir, 2), &states).unwrap();
        let stats = sim.run().unwrap();
        assert_eq!(stats.ball_ball_collisions, 0);
        assert_eq!(stats.ball_wall_collisions, 0);
        assert_eq!(stats.grid_transits, 0);
        assert_eq!(stats.exports, 6);
        assert_eq!(sim.current_time(), 5.0);
    }

    #[test]
    fn transit_preserves_kinematics_and_membership() {
        let dir = tempfile::tempdir().unwrap();
        let states = [(Vector2::new(1.5, 1.0), Vector2::new(1.0, 0.0))];
        let mut sim = Simulation::<2>::with_initial_state(
            SimulationConfig { simulation_time: 1.0, ..config(&dir, 1) },
            &states,
        )
        .unwrap();
        let stats = sim.run().unwrap();
        // One crossing at t=0.5 into cell (2,1), none after.
        assert_eq!(stats.grid_transits, 1);
        let ball = &sim.balls()[0];
        assert_eq!(ball.cell, [2, 1]);
        assert_eq!(ball.generation, 0);
        assert!(sim.grid().contains(0, [2, 1]));
        assert_eq!(sim.grid().occupant_count(0), 1);
        // The transit never advanced the ball.
        assert_eq!(ball.time, 0.0);
        assert_relative_eq!(ball.position.x, 1.5);
    }

    #[test]
    fn wall_bounce_reverses_and_invalidates() {
        let dir = tempfile::tempdir().unwrap();
        let states = [(Vector2::new(1.0, 1.0), Vector2::new(-1.0, 0.0))];
        let mut sim = Simulation::<2>::with_initial_state(
            SimulationConfig { simulation_time: 1.0, ..config(&dir, 1) },
            &states,
        )
        .unwrap();
        let stats = sim.run().unwrap();
        // Left wall at 0.01: contact at x=0.41 after 0.59.
        assert_eq!(stats.ball_wall_collisions, 1);
        let ball = &sim.balls()[0];
        assert_relative_eq!(ball.velocity.x, 1.0, epsilon = 1e-12);
        assert_eq!(ball.generation, 1);
        // At t=1 the ball has rebounded to x = 0.41 + 0.41.
        let (p, _) = ball.peek(1.0, false);
        assert_relative_eq!(p.x, 0.82, epsilon = 1e-12);
    }

    #[test]
    fn overlapping_initial_state_fails_at_first_export() {
        let dir = tempfile::tempdir().unwrap();
        let states = [
            (Vector2::new(1.0, 1.0), Vector2::zeros()),
            (Vector2::new(1.5, 1.0), Vector2::zeros()),
        ];
        let mut sim =
            Simulation::<2>::with_initial_state(config(&dir, 2), &states).unwrap();
        let err = sim.run().unwrap_err();
        assert!(matches!(
            err,
            SimulationError::Overlap { first: 0, second: 1, .. }
        ));
    }

    #[test]
    fn run_dispatch_rejects_bad_ndim() {
        let dir = tempfile::tempdir().unwrap();
        let bad = SimulationConfig { ndim: 4, domain_size: vec![2.0; 4], ..config(&dir, 1) };
        assert!(matches!(run(bad), Err(SimulationError::Config(_))));
    }
}
