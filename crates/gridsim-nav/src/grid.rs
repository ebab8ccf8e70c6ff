use core::fmt;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use gridsim_fsm::DeterministicRng;

use crate::{Adjacency, Cell, GridError, Terrain};

/// Terrain and weight of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tile {
    pub terrain: Terrain,
    pub weight: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileChange {
    pub cell: Cell,
    pub old: Tile,
    pub new: Tile,
}

/// Notified after every [`Grid::set_tile`]. Observers are shared with grid snapshots, so they
/// take `&self` and must be thread-safe.
pub trait TileObserver: Send + Sync {
    fn tile_changed(&self, change: &TileChange);
}

/// Weighted 2D map.
///
/// Weights are stored sparsely: cells without an override use the grid's default weight. A
/// cell is free iff it is in bounds, its weight is non-zero and it is not in the blocked set.
#[derive(Clone)]
pub struct Grid {
    width: i32,
    height: i32,
    default_weight: u32,
    weights: HashMap<Cell, u32>,
    terrain: HashMap<Cell, Terrain>,
    blocked: HashSet<Cell>,
    discovered: Vec<bool>,
    fog_enabled: bool,
    corner_cutting: bool,
    observers: Vec<Arc<dyn TileObserver>>,
}

impl Grid {
    pub fn new(width: u32, height: u32) -> Result<Self, GridError> {
        let (Ok(w), Ok(h)) = (i32::try_from(width), i32::try_from(height)) else {
            return Err(GridError::Empty { width, height });
        };
        if w == 0 || h == 0 {
            return Err(GridError::Empty { width, height });
        }
        Ok(Self {
            width: w,
            height: h,
            default_weight: 1,
            weights: HashMap::new(),
            terrain: HashMap::new(),
            blocked: HashSet::new(),
            discovered: vec![true; (w as usize) * (h as usize)],
            fog_enabled: false,
            corner_cutting: false,
            observers: Vec::new(),
        })
    }

    pub fn with_default_weight(mut self, weight: u32) -> Self {
        self.default_weight = weight;
        self
    }

    /// Enabling fog marks every cell undiscovered.
    pub fn with_fog(mut self, enabled: bool) -> Self {
        self.set_fog_enabled(enabled);
        self
    }

    pub fn with_corner_cutting(mut self, allowed: bool) -> Self {
        self.corner_cutting = allowed;
        self
    }

    pub fn width(&self) -> u32 {
        self.width as u32
    }

    pub fn height(&self) -> u32 {
        self.height as u32
    }

    pub fn cell_count(&self) -> usize {
        self.discovered.len()
    }

    pub fn default_weight(&self) -> u32 {
        self.default_weight
    }

    pub fn in_bounds(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.y >= 0 && cell.x < self.width && cell.y < self.height
    }

    /// All cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| Cell::new(x, y)))
    }

    pub(crate) fn index(&self, cell: Cell) -> Option<usize> {
        if !self.in_bounds(cell) {
            return None;
        }
        Some((cell.y * self.width + cell.x) as usize)
    }

    pub(crate) fn cell_at(&self, idx: usize) -> Cell {
        let idx = idx as i32;
        Cell::new(idx % self.width, idx / self.width)
    }

    fn check(&self, cell: Cell) -> Result<usize, GridError> {
        self.index(cell).ok_or(GridError::OutOfBounds {
            cell,
            width: self.width(),
            height: self.height(),
        })
    }

    pub fn cost(&self, cell: Cell) -> u32 {
        self.weights
            .get(&cell)
            .copied()
            .unwrap_or(self.default_weight)
    }

    pub fn terrain(&self, cell: Cell) -> Terrain {
        self.terrain.get(&cell).copied().unwrap_or_default()
    }

    pub fn tile(&self, cell: Cell) -> Tile {
        Tile {
            terrain: self.terrain(cell),
            weight: self.cost(cell),
        }
    }

    pub fn is_free(&self, cell: Cell) -> bool {
        self.in_bounds(cell) && self.cost(cell) != 0 && !self.blocked.contains(&cell)
    }

    pub fn is_blocked(&self, cell: Cell) -> bool {
        self.blocked.contains(&cell)
    }

    pub fn set_blocked(&mut self, cell: Cell, blocked: bool) -> Result<(), GridError> {
        self.check(cell)?;
        if blocked {
            self.blocked.insert(cell);
        } else {
            self.blocked.remove(&cell);
        }
        Ok(())
    }

    /// Free neighbours of `cell` in fixed order, narrowed by `filter` when given.
    ///
    /// Diagonal steps require both adjacent orthogonal cells to be free unless corner cutting
    /// is enabled.
    pub fn neighbours<'a>(
        &'a self,
        cell: Cell,
        adjacency: Adjacency,
        filter: Option<&'a (dyn Fn(Cell) -> bool + 'a)>,
    ) -> impl Iterator<Item = Cell> + 'a {
        adjacency.offsets().iter().filter_map(move |&(dx, dy)| {
            let next = cell.checked_offset(dx, dy)?;
            if !self.is_free(next) {
                return None;
            }
            let side_x = Cell::new(next.x, cell.y);
            let side_y = Cell::new(cell.x, next.y);
            if dx != 0
                && dy != 0
                && !self.corner_cutting
                && !(self.is_free(side_x) && self.is_free(side_y))
            {
                return None;
            }
            match filter {
                Some(filter) if !filter(next) => None,
                _ => Some(next),
            }
        })
    }

    pub fn add_observer(&mut self, observer: Arc<dyn TileObserver>) {
        self.observers.push(observer);
    }

    /// Replace the terrain of `cell`. Without an explicit weight the terrain's default weight
    /// is used.
    pub fn set_tile(
        &mut self,
        cell: Cell,
        terrain: Terrain,
        weight: Option<u32>,
    ) -> Result<TileChange, GridError> {
        self.check(cell)?;
        let old = self.tile(cell);
        let new = Tile {
            terrain,
            weight: weight.unwrap_or_else(|| terrain.default_weight()),
        };

        if terrain == Terrain::Ground {
            self.terrain.remove(&cell);
        } else {
            self.terrain.insert(cell, terrain);
        }
        if new.weight == self.default_weight {
            self.weights.remove(&cell);
        } else {
            self.weights.insert(cell, new.weight);
        }

        let change = TileChange { cell, old, new };
        for observer in &self.observers {
            observer.tile_changed(&change);
        }
        Ok(change)
    }

    /// Set every cell of the `size x size` square whose top-left corner is `origin`.
    pub fn fill_block(
        &mut self,
        origin: Cell,
        size: u32,
        terrain: Terrain,
        weight: Option<u32>,
    ) -> Result<(), GridError> {
        let size = size as i32;
        for dy in 0..size {
            for dx in 0..size {
                self.set_tile(origin.offset(dx, dy), terrain, weight)?;
            }
        }
        Ok(())
    }

    /// Set `count` randomly chosen cells of the square at `origin` (repeats allowed).
    pub fn scatter_block(
        &mut self,
        origin: Cell,
        size: u32,
        terrain: Terrain,
        weight: Option<u32>,
        count: u32,
        rng: &mut impl DeterministicRng,
    ) -> Result<(), GridError> {
        if size == 0 {
            return Ok(());
        }
        let last = size as i32 - 1;
        for _ in 0..count {
            let dx = rng.next_i32_in(0, last);
            let dy = rng.next_i32_in(0, last);
            self.set_tile(origin.offset(dx, dy), terrain, weight)?;
        }
        Ok(())
    }

    pub fn fog_enabled(&self) -> bool {
        self.fog_enabled
    }

    /// Toggle fog of war. Enabling it hides every cell; disabling it reveals every cell.
    pub fn set_fog_enabled(&mut self, enabled: bool) {
        self.fog_enabled = enabled;
        self.discovered.fill(!enabled);
    }

    /// Mark `cell` undiscovered (`fogged = true`) or discovered.
    pub fn set_fog(&mut self, cell: Cell, fogged: bool) -> Result<(), GridError> {
        let idx = self.check(cell)?;
        self.discovered[idx] = !fogged;
        Ok(())
    }

    /// `true` when fog is enabled and `cell` has not been discovered. Out-of-bounds cells are
    /// never fogged.
    pub fn is_fogged(&self, cell: Cell) -> bool {
        self.fog_enabled
            && self
                .index(cell)
                .is_some_and(|idx| !self.discovered[idx])
    }

    /// Discover every cell within `radius` (square) of `center`, returning the cells that were
    /// undiscovered before.
    pub fn reveal(&mut self, center: Cell, radius: u32) -> Vec<Cell> {
        if !self.fog_enabled {
            return Vec::new();
        }
        let (x0, x1, y0, y1) = self.window(center, radius);
        let mut revealed = Vec::new();
        for y in y0..=y1 {
            for x in x0..=x1 {
                let cell = Cell::new(x, y);
                let Some(idx) = self.index(cell) else { continue };
                if !self.discovered[idx] {
                    self.discovered[idx] = true;
                    revealed.push(cell);
                }
            }
        }
        revealed
    }

    /// Uniformly chosen free cell, optionally restricted to a square around `origin`, skipping
    /// cells for which `exclude` returns `true`.
    pub fn random_free_cell(
        &self,
        rng: &mut impl DeterministicRng,
        origin: Option<Cell>,
        radius: Option<u32>,
        exclude: impl Fn(Cell) -> bool,
    ) -> Option<Cell> {
        let (x0, x1, y0, y1) = match (origin, radius) {
            (Some(origin), Some(radius)) => self.window(origin, radius),
            _ => (0, self.width - 1, 0, self.height - 1),
        };
        let candidates: Vec<Cell> = (y0..=y1)
            .flat_map(|y| (x0..=x1).map(move |x| Cell::new(x, y)))
            .filter(|&cell| self.is_free(cell) && !exclude(cell))
            .collect();
        let idx = rng.next_index(candidates.len())?;
        Some(candidates[idx])
    }

    /// Inclusive bounds of the square of `radius` around `center`, clamped to the grid.
    fn window(&self, center: Cell, radius: u32) -> (i32, i32, i32, i32) {
        let r = i32::try_from(radius).unwrap_or(i32::MAX);
        (
            center.x.saturating_sub(r).max(0),
            center.x.saturating_add(r).min(self.width - 1),
            center.y.saturating_sub(r).max(0),
            center.y.saturating_add(r).min(self.height - 1),
        )
    }
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grid")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("default_weight", &self.default_weight)
            .field("weighted_cells", &self.weights.len())
            .field("blocked_cells", &self.blocked.len())
            .field("fog_enabled", &self.fog_enabled)
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_round_trips_through_cell_at() {
        let grid = Grid::new(7, 3).unwrap();
        for cell in grid.cells() {
            let idx = grid.index(cell).unwrap();
            assert_eq!(grid.cell_at(idx), cell);
        }
        assert_eq!(grid.index(Cell::new(7, 0)), None);
        assert_eq!(grid.index(Cell::new(0, -1)), None);
    }

    #[test]
    fn window_is_clamped() {
        let grid = Grid::new(10, 10).unwrap();
        assert_eq!(grid.window(Cell::new(1, 8), 3), (0, 4, 5, 9));
        assert_eq!(grid.window(Cell::new(5, 5), u32::MAX), (0, 9, 0, 9));
    }
}
