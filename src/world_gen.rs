use nalgebra::SVector;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rand_pcg::Pcg64;

use crate::ball::Ball;
use crate::config::SimulationConfig;
use crate::error::SimulationError;
use crate::grid::Grid;

/// Seat each ball at the center of its own cell, row-major along the axes,
/// and register it in the grid. Velocities are i.i.d. N(0,1) per axis from
/// the configured seed, so identical configs produce identical worlds.
pub fn place_balls<const D: usize>(
    config: &SimulationConfig,
    grid: &mut Grid<D>,
) -> Result<Vec<Ball<D>>, SimulationError> {
    let mut columns = [0usize; D];
    for axis in 0..D {
        columns[axis] = config.domain_size[axis] as usize;
    }
    let capacity: usize = columns.iter().product();
    if config.num_balls > capacity {
        return Err(SimulationError::Placement {
            num_balls: config.num_balls,
            capacity,
        });
    }

    let mut rng = Pcg64::seed_from_u64(config.random_seed);
    let mut balls = Vec::with_capacity(config.num_balls);
    for index in 0..config.num_balls {
        let mut cell = [0usize; D];
        let mut rest = index;
        for axis in 0..D {
            cell[axis] = rest % columns[axis];
            rest /= columns[axis];
        }

        let mut position = SVector::<f64, D>::zeros();
        let mut velocity = SVector::<f64, D>::zeros();
        for axis in 0..D {
            position[axis] = cell[axis] as f64 + 0.5;
            velocity[axis] = rng.sample::<f64, _>(StandardNormal);
        }

        grid.insert(index, cell);
        balls.push(Ball::new(index, position, velocity, config.ball_radius, cell));
    }
    Ok(balls)
}
