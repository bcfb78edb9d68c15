use fnv::{FnvHashMap, FnvHashSet};
use nalgebra::SVector;

/// Cells are unit-sized; this fixes the length scale and caps the ball radius
/// at 0.5 so non-adjacent cells can never hold touching balls.
pub const CELL_SIZE: f64 = 1.0;

/// Uniform axis-aligned partition of the box into unit cells, each owning the
/// set of ball indices whose centers are inside it.
pub struct Grid<const D: usize> {
    num_cells: [usize; D],
    cells: FnvHashMap<[usize; D], FnvHashSet<usize>>,
}

impl<const D: usize> Grid<D> {
    pub fn new(domain_size: &[f64; D]) -> Self {
        let mut num_cells = [0usize; D];
        for axis in 0..D {
            num_cells[axis] = domain_size[axis].ceil() as usize;
        }
        Grid {
            num_cells,
            cells: FnvHashMap::default(),
        }
    }

    pub fn num_cells(&self) -> &[usize; D] {
        &self.num_cells
    }

    /// Floor of the position per axis, clamped into the grid.
    pub fn position_to_cell(&self, position: &SVector<f64, D>) -> [usize; D] {
        let mut cell = [0usize; D];
        for axis in 0..D {
            let coord = (position[axis] / CELL_SIZE).floor() as isize;
            cell[axis] = coord.clamp(0, self.num_cells[axis] as isize - 1) as usize;
        }
        cell
    }

    pub fn insert(&mut self, ball: usize, cell: [usize; D]) {
        self.cells.entry(cell).or_default().insert(ball);
    }

    pub fn remove(&mut self, ball: usize, cell: [usize; D]) {
        if let Some(occupants) = self.cells.get_mut(&cell) {
            occupants.remove(&ball);
            if occupants.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }

    pub fn move_ball(&mut self, ball: usize, old_cell: [usize; D], new_cell: [usize; D]) {
        self.remove(ball, old_cell);
        self.insert(ball, new_cell);
    }

    pub fn contains(&self, ball: usize, cell: [usize; D]) -> bool {
        self.cells.get(&cell).is_some_and(|c| c.contains(&ball))
    }

    pub fn occupant_count(&self, ball: usize) -> usize {
        self.cells.values().filter(|c| c.contains(&ball)).count()
    }

    /// Occupants of the 3^D block centered on `cell`, bounded at the domain
    /// edges. Sorted so downstream event generation is order-stable.
    pub fn neighbors(&self, cell: [usize; D]) -> Vec<usize> {
        let mut found = Vec::new();
        for neighbor in self.neighbor_cells(cell) {
            if let Some(occupants) = self.cells.get(&neighbor) {
                found.extend(occupants.iter().copied());
            }
        }
        found.sort_unstable();
        found
    }

    /// Occupants of the cells adjacent to `new_cell` that were not adjacent
    /// to `old_cell`: the leading face in each moved direction, 3 cells in 2D
    /// and 9 in 3D for a single-axis step.
    pub fn incoming_neighbors(&self, old_cell: [usize; D], new_cell: [usize; D]) -> Vec<usize> {
        let mut found = FnvHashSet::default();
        for axis in 0..D {
            let step = new_cell[axis] as isize - old_cell[axis] as isize;
            if step == 0 {
                continue;
            }
            let face = new_cell[axis] as isize + step;
            if face < 0 || face >= self.num_cells[axis] as isize {
                continue;
            }
            for neighbor in self.neighbor_cells(new_cell) {
                if neighbor[axis] as isize != face {
                    continue;
                }
                if let Some(occupants) = self.cells.get(&neighbor) {
                    found.extend(occupants.iter().copied());
                }
            }
        }
        let mut found: Vec<usize> = found.into_iter().collect();
        found.sort_unstable();
        found
    }

    /// In-bounds cells of the 3^D block around `cell`, the cell included.
    fn neighbor_cells(&self, cell: [usize; D]) -> Vec<[usize; D]> {
        let mut block = Vec::with_capacity(3usize.pow(D as u32));
        'offsets: for code in 0..3usize.pow(D as u32) {
            let mut rest = code;
            let mut neighbor = [0usize; D];
            for axis in 0..D {
                let delta = (rest % 3) as isize - 1;
                rest /= 3;
                let coord = cell[axis] as isize + delta;
                if coord < 0 || coord >= self.num_cells[axis] as isize {
                    continue 'offsets;
                }
                neighbor[axis] = coord as usize;
            }
            block.push(neighbor);
        }
        block
    }
}
