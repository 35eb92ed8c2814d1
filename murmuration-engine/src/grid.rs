//! Uniform spatial hash grid over 3-D space, rebuilt from scratch every
//! frame. Maps a cell coordinate to the agent indices inside it so the
//! per-agent update only scans the 27 adjacent cells instead of the
//! whole population.

use glam::{IVec3, Vec3};
use rayon::prelude::*;
use smallvec::SmallVec;
use std::collections::HashMap;

type CellMembers = SmallVec<[u32; 8]>;

/// Offsets of the full 3x3x3 neighbourhood, including the center cell.
pub const ADJACENT: [IVec3; 27] = [
    IVec3::new(-1, -1, -1),
    IVec3::new(-1, -1, 0),
    IVec3::new(-1, -1, 1),
    IVec3::new(-1, 0, -1),
    IVec3::new(-1, 0, 0),
    IVec3::new(-1, 0, 1),
    IVec3::new(-1, 1, -1),
    IVec3::new(-1, 1, 0),
    IVec3::new(-1, 1, 1),
    IVec3::new(0, -1, -1),
    IVec3::new(0, -1, 0),
    IVec3::new(0, -1, 1),
    IVec3::new(0, 0, -1),
    IVec3::new(0, 0, 0),
    IVec3::new(0, 0, 1),
    IVec3::new(0, 1, -1),
    IVec3::new(0, 1, 0),
    IVec3::new(0, 1, 1),
    IVec3::new(1, -1, -1),
    IVec3::new(1, -1, 0),
    IVec3::new(1, -1, 1),
    IVec3::new(1, 0, -1),
    IVec3::new(1, 0, 0),
    IVec3::new(1, 0, 1),
    IVec3::new(1, 1, -1),
    IVec3::new(1, 1, 0),
    IVec3::new(1, 1, 1),
];

/// Sparse multi-valued map from cell coordinate to member indices.
/// Membership is always exactly the snapshot it was built from; there is
/// no removal or incremental update.
#[derive(Debug)]
pub struct SpatialGrid {
    cell_size: f32,
    cells: HashMap<IVec3, CellMembers>,
    member_count: usize,
}

impl SpatialGrid {
    /// Scatter `positions` into cells of `cell_size`. O(N); insertion is
    /// parallelized with per-thread maps merged at the end.
    pub fn build(cell_size: f32, positions: &[Vec3]) -> Self {
        debug_assert!(cell_size > 0.0, "cell size must be positive");

        let cells = positions
            .par_iter()
            .enumerate()
            .fold(HashMap::<IVec3, CellMembers>::new, |mut cells, (index, &position)| {
                cells
                    .entry(cell_key(position, cell_size))
                    .or_default()
                    .push(index as u32);
                cells
            })
            .reduce(HashMap::new, |mut merged, cells| {
                for (key, mut members) in cells {
                    merged.entry(key).or_default().append(&mut members);
                }
                merged
            });

        Self {
            cell_size,
            cells,
            member_count: positions.len(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// The cell coordinate containing `position`.
    pub fn key_of(&self, position: Vec3) -> IVec3 {
        cell_key(position, self.cell_size)
    }

    /// Member indices in exactly this cell.
    pub fn members(&self, key: IVec3) -> &[u32] {
        self.cells.get(&key).map(|members| members.as_slice()).unwrap_or(&[])
    }

    /// Calls `visit` for every member index in the 27-cell neighbourhood
    /// around `key`, including the cell itself.
    pub fn for_each_adjacent<F: FnMut(u32)>(&self, key: IVec3, mut visit: F) {
        for offset in ADJACENT {
            for &index in self.members(key + offset) {
                visit(index);
            }
        }
    }

    /// Number of occupied cells.
    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }

    /// Total number of inserted member indices.
    pub fn member_count(&self) -> usize {
        self.member_count
    }
}

fn cell_key(position: Vec3, cell_size: f32) -> IVec3 {
    (position / cell_size).floor().as_ivec3()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(count: usize, spread: f32) -> Vec<Vec3> {
        // Deterministic pseudo-random scatter, no RNG needed
        (0..count)
            .map(|i| {
                let f = i as f32;
                Vec3::new(
                    (f * 0.731).sin() * spread,
                    (f * 1.317).cos() * spread,
                    (f * 2.113).sin() * spread,
                )
            })
            .collect()
    }

    #[test]
    fn own_cell_contains_own_index_exactly_once() {
        let positions = cluster(200, 40.0);
        let grid = SpatialGrid::build(10.0, &positions);

        for (index, &position) in positions.iter().enumerate() {
            let members = grid.members(grid.key_of(position));
            let occurrences = members.iter().filter(|&&m| m as usize == index).count();
            assert_eq!(occurrences, 1, "index {index}");
        }
        assert_eq!(grid.member_count(), positions.len());
    }

    #[test]
    fn negative_coordinates_floor_correctly() {
        let grid = SpatialGrid::build(10.0, &[Vec3::new(-0.5, -0.5, -0.5)]);
        assert_eq!(grid.key_of(Vec3::new(-0.5, -0.5, -0.5)), IVec3::new(-1, -1, -1));
        assert_eq!(grid.members(IVec3::new(-1, -1, -1)), &[0]);
        // Not in the origin cell
        assert!(grid.members(IVec3::ZERO).is_empty());
    }

    #[test]
    fn adjacency_covers_neighbours_within_one_cell() {
        let positions = vec![
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(11.0, 1.0, 1.0),  // +x neighbour cell
            Vec3::new(-9.0, 1.0, 1.0),  // -x neighbour cell
            Vec3::new(25.0, 1.0, 1.0),  // two cells away, not adjacent
        ];
        let grid = SpatialGrid::build(10.0, &positions);

        let mut seen = Vec::new();
        grid.for_each_adjacent(grid.key_of(positions[0]), |index| seen.push(index));
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn empty_build_has_no_cells() {
        let grid = SpatialGrid::build(5.0, &[]);
        assert_eq!(grid.occupied_cells(), 0);
        assert_eq!(grid.member_count(), 0);
        assert!(grid.members(IVec3::ZERO).is_empty());
    }
}
