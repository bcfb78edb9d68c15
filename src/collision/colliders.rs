use nalgebra::SVector;

use crate::ball::Ball;
use crate::wall::Wall;

use super::VELOCITY_SQ_EPSILON;

/// Equal-mass impulse exchange along the line of centers. Returns `false`
/// when the separating-velocity guard fires instead of applying an impulse;
/// the caller counts those, a nonzero total marks the run as failed.
pub fn collide_ball_ball<const D: usize>(
    first: &mut Ball<D>,
    second: &mut Ball<D>,
    restitution: f64,
) -> bool {
    let rel_pos = second.position - first.position;
    let dist_sq = rel_pos.norm_squared();
    let normal = if dist_sq < VELOCITY_SQ_EPSILON {
        // Coincident centers; any axis serves as the normal.
        let mut n = SVector::<f64, D>::zeros();
        n[0] = 1.0;
        n
    } else {
        rel_pos / dist_sq.sqrt()
    };

    let rel_vel = second.velocity - first.velocity;
    let along_normal = rel_vel.dot(&normal);
    if along_normal >= 0.0 {
        // Already separating; a grazing contact must not inject energy.
        return false;
    }

    let impulse = normal * (0.5 * (1.0 + restitution) * along_normal);
    first.velocity += impulse;
    second.velocity -= impulse;
    true
}

/// Reflect the normal component of the ball's velocity off the wall. The
/// outward normal points from the wall plane toward the ball's side.
pub fn collide_ball_wall<const D: usize>(ball: &mut Ball<D>, wall: &Wall) -> bool {
    let mut normal = SVector::<f64, D>::zeros();
    normal[wall.axis] = if ball.position[wall.axis] < wall.coordinate {
        -1.0
    } else {
        1.0
    };

    let along_normal = ball.velocity.dot(&normal);
    if along_normal >= 0.0 {
        return false;
    }

    ball.velocity -= normal * ((1.0 + wall.restitution) * along_normal);
    true
}
