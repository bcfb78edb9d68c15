use crate::ball::{gravity_vector, Ball};
use crate::grid::{Grid, CELL_SIZE};
use crate::wall::Wall;

use super::{TIME_EPSILON, VELOCITY_EPSILON, VELOCITY_SQ_EPSILON};

/// Smallest root of `a·x² + b·x + c = 0` strictly greater than `lower`,
/// falling back to the linear solution when the quadratic degenerates.
fn smallest_root_above(a: f64, b: f64, c: f64, lower: f64) -> Option<f64> {
    if a.abs() < VELOCITY_SQ_EPSILON {
        if b.abs() < VELOCITY_SQ_EPSILON {
            return None;
        }
        let root = -c / b;
        return (root > lower).then_some(root);
    }
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }
    let sqrt_discriminant = discriminant.sqrt();
    let root0 = (-b - sqrt_discriminant) / (2.0 * a);
    let root1 = (-b + sqrt_discriminant) / (2.0 * a);
    let (lo, hi) = if root0 <= root1 { (root0, root1) } else { (root1, root0) };
    if lo > lower {
        Some(lo)
    } else if hi > lower {
        Some(hi)
    } else {
        None
    }
}

/// Absolute time at which the two balls next touch, if they do.
///
/// Without gravity both states are evaluated at `t_now` and the relative
/// quadratic `|Δp + Δv·τ|² = r²` is solved for τ. With gravity the balls'
/// local times differ, so the ½g(t-t_b)² terms do not cancel; the relative
/// displacement is built as a function of absolute time instead:
///
///   d(t) = A + B·t
///   A = (p₂-p₁) + v₁t₁ - v₂t₂ + ½g(t₂²-t₁²)
///   B = (v₂-v₁) + g(t₁-t₂)
///
/// The t² term cancels because both bodies share the same g, so d(t) stays
/// affine and `|A + B·t|² = r²` is an ordinary quadratic in t.
pub fn ball_ball_collision_time<const D: usize>(
    first: &Ball<D>,
    second: &Ball<D>,
    t_now: f64,
    gravity: bool,
) -> Option<f64> {
    let r = first.radius + second.radius;

    if !gravity {
        let (p1, v1) = first.peek(t_now, false);
        let (p2, v2) = second.peek(t_now, false);
        let rel_pos = p2 - p1;
        let rel_vel = v2 - v1;

        // Cheap rejects: separating, or no relative motion.
        let pos_dot_vel = rel_pos.dot(&rel_vel);
        if pos_dot_vel > 0.0 {
            return None;
        }
        let rel_vel_sq = rel_vel.norm_squared();
        if rel_vel_sq < VELOCITY_SQ_EPSILON {
            return None;
        }

        let a = rel_vel_sq;
        let b = 2.0 * pos_dot_vel;
        let c = rel_pos.norm_squared() - r * r;
        let tau = smallest_root_above(a, b, c, TIME_EPSILON)?;
        return Some(t_now + tau);
    }

    let g = gravity_vector::<D>(true);
    let (t1, t2) = (first.time, second.time);
    let a_vec = (second.position - first.position) + first.velocity * t1
        - second.velocity * t2
        + g * (0.5 * (t2 * t2 - t1 * t1));
    let b_vec = (second.velocity - first.velocity) + g * (t1 - t2);

    let a = b_vec.norm_squared();
    let b = 2.0 * a_vec.dot(&b_vec);
    let c = a_vec.norm_squared() - r * r;
    smallest_root_above(a, b, c, t_now + TIME_EPSILON)
}

/// Absolute time at which the ball's surface reaches the wall plane.
///
/// The target plane for the center sits one radius short of the wall on the
/// ball's side. Vertical motion under gravity needs the quadratic; every
/// other case is linear.
pub fn ball_wall_collision_time<const D: usize>(
    ball: &Ball<D>,
    wall: &Wall,
    t_now: f64,
    gravity: bool,
) -> Option<f64> {
    let (pos, vel) = ball.peek(t_now, gravity);
    let axis = wall.axis;
    let target = if pos[axis] < wall.coordinate {
        wall.coordinate - ball.radius
    } else {
        wall.coordinate + ball.radius
    };

    let tau = if axis == 1 && gravity {
        // pos_y + v_y·τ - ½τ² = target
        smallest_root_above(-0.5, vel[1], pos[1] - target, TIME_EPSILON)?
    } else {
        let v = vel[axis];
        if v.abs() < VELOCITY_EPSILON {
            return None;
        }
        let tau = (target - pos[axis]) / v;
        if tau <= TIME_EPSILON {
            return None;
        }
        tau
    };
    Some(t_now + tau)
}

/// Earliest crossing of a face of the ball's current cell, with the cell the
/// crossing leads into. Axes are scanned in order and a strictly earlier time
/// is required to displace the running winner, so ties resolve to the lowest
/// axis deterministically. Crossings that would leave the clamped grid are
/// not reported; the wall collision always fires first.
pub fn grid_transit_time<const D: usize>(
    ball: &Ball<D>,
    grid: &Grid<D>,
    t_now: f64,
    gravity: bool,
) -> Option<(f64, [usize; D])> {
    let (pos, vel) = ball.peek(t_now, gravity);
    let mut earliest: Option<(f64, [usize; D])> = None;

    for axis in 0..D {
        let coord = ball.cell[axis] as isize;
        if vel[axis].abs() < VELOCITY_EPSILON && !(axis == 1 && gravity) {
            continue;
        }
        let faces = [
            (coord as f64 * CELL_SIZE, coord - 1),
            ((coord + 1) as f64 * CELL_SIZE, coord + 1),
        ];
        for (boundary, new_coord) in faces {
            if new_coord < 0 || new_coord >= grid.num_cells()[axis] as isize {
                continue;
            }
            let tau = if axis == 1 && gravity {
                smallest_root_above(-0.5, vel[1], pos[1] - boundary, TIME_EPSILON)
            } else {
                let t = (boundary - pos[axis]) / vel[axis];
                (t > TIME_EPSILON).then_some(t)
            };
            if let Some(tau) = tau {
                if earliest.map_or(true, |(best, _)| tau < best) {
                    let mut cell = ball.cell;
                    cell[axis] = new_coord as usize;
                    earliest = Some((tau, cell));
                }
            }
        }
    }

    earliest.map(|(tau, cell)| (t_now + tau, cell))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector2;

    fn ball(index: usize, p: (f64, f64), v: (f64, f64), radius: f64) -> Ball<2> {
        let position = Vector2::new(p.0, p.1);
        let velocity = Vector2::new(v.0, v.1);
        let cell = [position.x as usize, position.y as usize];
        Ball::new(index, position, velocity, radius, cell)
    }

    #[test]
    fn head_on_pair_meets_at_the_closed_form_time() {
        let a = ball(0, (1.0, 1.0), (1.0, 0.0), 0.4);
        let b = ball(1, (5.0, 1.0), (-1.0, 0.0), 0.4);
        // τ = (|Δp| - 2r) / |Δv| = (4 - 0.8) / 2
        let t = ball_ball_collision_time(&a, &b, 0.0, false).unwrap();
        assert_relative_eq!(t, 1.6, epsilon = 1e-12);
    }

    #[test]
    fn separating_pair_never_collides() {
        let a = ball(0, (1.0, 1.0), (-1.0, 0.0), 0.4);
        let b = ball(1, (3.0, 1.0), (1.0, 0.0), 0.4);
        assert!(ball_ball_collision_time(&a, &b, 0.0, false).is_none());
    }

    #[test]
    fn relatively_static_pair_never_collides() {
        let a = ball(0, (1.0, 1.0), (0.7, 0.2), 0.4);
        let b = ball(1, (3.0, 1.0), (0.7, 0.2), 0.4);
        assert!(ball_ball_collision_time(&a, &b, 0.0, false).is_none());
    }

    #[test]
    fn offset_local_times_follow_the_affine_law() {
        // Ball b was advanced to t=0.5 by an earlier event and carries that
        // local time; the relative displacement must be built in absolute time.
        let a = ball(0, (1.0, 2.0), (1.0, 0.0), 0.3);
        let mut b = ball(1, (4.0, 2.0), (-1.0, 0.0), 0.3);
        b.advance(0.5, true);

        let t = ball_ball_collision_time(&a, &b, 0.5, true).unwrap();

        // Same g on both sides, so the vertical terms cancel and the gap
        // closes at 2 per unit time from 3 - 0.6 apart.
        let expected = (3.0 - 0.6) / 2.0;
        assert_relative_eq!(t, expected, epsilon = 1e-10);
    }

    #[test]
    fn collision_search_starts_at_t_now() {
        let a = ball(0, (1.0, 1.0), (1.0, 0.0), 0.4);
        let b = ball(1, (5.0, 1.0), (-1.0, 0.0), 0.4);
        let t = ball_ball_collision_time(&a, &b, 1.0, false).unwrap();
        assert_relative_eq!(t, 1.6, epsilon = 1e-12);
    }

    #[test]
    fn wall_hit_is_linear_without_gravity() {
        let b = ball(0, (1.0, 1.0), (-1.0, 0.0), 0.4);
        let wall = Wall { axis: 0, coordinate: 0.01, restitution: 1.0 };
        let t = ball_wall_collision_time(&b, &wall, 0.0, false).unwrap();
        // Center reaches 0.41 after traveling 0.59.
        assert_relative_eq!(t, 0.59, epsilon = 1e-12);
    }

    #[test]
    fn wall_behind_a_ball_moving_away_is_unreachable() {
        let b = ball(0, (1.0, 1.0), (1.0, 0.0), 0.4);
        let wall = Wall { axis: 0, coordinate: 0.01, restitution: 1.0 };
        assert!(ball_wall_collision_time(&b, &wall, 0.0, false).is_none());
    }

    #[test]
    fn floor_hit_under_gravity_is_quadratic() {
        let b = ball(0, (2.0, 3.0), (0.0, 0.0), 0.3);
        let floor = Wall { axis: 1, coordinate: 0.01, restitution: 1.0 };
        let t = ball_wall_collision_time(&b, &floor, 0.0, true).unwrap();
        // 3 - ½t² = 0.31
        assert_relative_eq!(t, (2.0_f64 * (3.0 - 0.31)).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn stationary_ball_without_gravity_hits_nothing() {
        let b = ball(0, (2.0, 1.0), (0.0, 0.0), 0.3);
        let wall = Wall { axis: 0, coordinate: 0.01, restitution: 1.0 };
        assert!(ball_wall_collision_time(&b, &wall, 0.0, false).is_none());
    }

    #[test]
    fn transit_reports_the_earliest_axis() {
        let grid: Grid<2> = Grid::new(&[6.0, 6.0]);
        // Reaches x=3 after 0.5, y=2 after 2.0.
        let b = ball(0, (2.5, 1.5), (1.0, 0.25), 0.3);
        let (t, cell) = grid_transit_time(&b, &grid, 0.0, false).unwrap();
        assert_relative_eq!(t, 0.5, epsilon = 1e-12);
        assert_eq!(cell, [3, 1]);
    }

    #[test]
    fn transit_tie_prefers_the_lowest_axis() {
        let grid: Grid<2> = Grid::new(&[6.0, 6.0]);
        // Corner crossing: both boundaries reached at exactly 0.5.
        let b = ball(0, (2.5, 2.5), (1.0, 1.0), 0.3);
        let (t, cell) = grid_transit_time(&b, &grid, 0.0, false).unwrap();
        assert_relative_eq!(t, 0.5, epsilon = 1e-12);
        assert_eq!(cell, [3, 2]);
    }

    #[test]
    fn transit_out_of_the_grid_is_never_reported() {
        let grid: Grid<2> = Grid::new(&[6.0, 6.0]);
        let b = ball(0, (0.5, 1.5), (-1.0, 0.0), 0.3);
        assert!(grid_transit_time(&b, &grid, 0.0, false).is_none());
    }

    #[test]
    fn falling_ball_crosses_the_floor_of_its_cell() {
        let grid: Grid<2> = Grid::new(&[4.0, 4.0]);
        let b = ball(0, (1.5, 2.5), (0.0, 0.0), 0.3);
        let (t, cell) = grid_transit_time(&b, &grid, 0.0, true).unwrap();
        // 2.5 - ½t² = 2
        assert_relative_eq!(t, 1.0, epsilon = 1e-12);
        assert_eq!(cell, [1, 1]);
    }

    #[test]
    fn degenerate_quadratic_falls_back_to_linear() {
        assert_eq!(smallest_root_above(0.0, 2.0, -4.0, 0.0), Some(2.0));
        assert_eq!(smallest_root_above(0.0, 0.0, 1.0, 0.0), None);
    }

    #[test]
    fn negative_discriminant_yields_no_root() {
        assert_eq!(smallest_root_above(1.0, 0.0, 1.0, 0.0), None);
    }
}
