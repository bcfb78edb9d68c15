/// Distance the box walls are pulled in from the domain faces.
pub const WALL_INSET: f64 = 0.01;

/// An immobile planar boundary perpendicular to one coordinate axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Wall {
    /// Axis the wall is perpendicular to: 0=x, 1=y, 2=z.
    pub axis: usize,
    /// Position of the wall plane along `axis`.
    pub coordinate: f64,
    pub restitution: f64,
}

/// The walls of a rectangular box: a low and a high wall per axis, each inset
/// slightly from the domain face. Four walls in 2D, six in 3D.
pub fn create_box_walls<const D: usize>(domain_size: &[f64; D], restitution: f64) -> Vec<Wall> {
    let mut walls = Vec::with_capacity(2 * D);
    for axis in 0..D {
        walls.push(Wall {
            axis,
            coordinate: WALL_INSET,
            restitution,
        });
        walls.push(Wall {
            axis,
            coordinate: domain_size[axis] - WALL_INSET,
            restitution,
        });
    }
    walls
}
