//! Search algorithms over a [`Grid`].
//!
//! All searches are pure functions of their inputs. Frontier ties are broken by insertion
//! order, so equal-cost alternatives always resolve the same way.

use core::cmp::Ordering;
use core::fmt;
use std::collections::{BinaryHeap, VecDeque};

use tracing::trace;

use crate::{Adjacency, Cell, Grid, Heuristic};

/// Result of a search. A failed search always carries an empty path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathOutcome {
    pub success: bool,
    /// Cells from start to goal, both inclusive.
    pub path: Vec<Cell>,
}

impl PathOutcome {
    pub fn found(path: Vec<Cell>) -> Self {
        Self {
            success: true,
            path,
        }
    }

    pub fn failed() -> Self {
        Self::default()
    }

    pub fn goal(&self) -> Option<Cell> {
        self.path.last().copied()
    }

    /// Sum of the weights of every cell entered along the path.
    pub fn cost(&self, grid: &Grid) -> u64 {
        self.path
            .iter()
            .skip(1)
            .map(|&cell| u64::from(grid.cost(cell)))
            .sum()
    }
}

/// Search parameters shared by every algorithm.
#[derive(Clone, Copy)]
pub struct SearchOptions<'a> {
    pub adjacency: Adjacency,
    pub heuristic: Heuristic,
    /// Weight of the heuristic relative to accumulated cost.
    pub cost_multiplier: f64,
    /// Extra neighbour predicate applied after the free/in-bounds test.
    pub filter: Option<&'a (dyn Fn(Cell) -> bool + 'a)>,
}

impl<'a> SearchOptions<'a> {
    pub fn new(adjacency: Adjacency) -> Self {
        Self {
            adjacency,
            heuristic: Heuristic::for_adjacency(adjacency),
            cost_multiplier: 1.0,
            filter: None,
        }
    }

    pub fn with_heuristic(mut self, heuristic: Heuristic) -> Self {
        self.heuristic = heuristic;
        self
    }

    pub fn with_cost_multiplier(mut self, multiplier: f64) -> Self {
        self.cost_multiplier = multiplier;
        self
    }

    pub fn with_filter(mut self, filter: &'a (dyn Fn(Cell) -> bool + 'a)) -> Self {
        self.filter = Some(filter);
        self
    }
}

impl Default for SearchOptions<'_> {
    fn default() -> Self {
        Self::new(Adjacency::Eight)
    }
}

impl fmt::Debug for SearchOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchOptions")
            .field("adjacency", &self.adjacency)
            .field("heuristic", &self.heuristic)
            .field("cost_multiplier", &self.cost_multiplier)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

#[derive(Debug)]
struct OpenNode {
    priority: f64,
    seq: u64,
    g: u64,
    idx: usize,
}

impl OpenNode {
    fn key_cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then(self.seq.cmp(&other.seq))
    }
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.key_cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering to make BinaryHeap behave like a min-heap.
        other.key_cmp(self)
    }
}

/// Shortest path from `start` to `goal`.
///
/// The frontier is keyed by `g + cost_multiplier * heuristic(node, goal)`; with
/// [`Heuristic::None`] this is uniform-cost search. `start == goal` succeeds with a one-cell
/// path even if the cell is not free.
pub fn a_star_search(
    grid: &Grid,
    start: Cell,
    goal: Cell,
    options: &SearchOptions<'_>,
) -> PathOutcome {
    if start == goal {
        return PathOutcome::found(vec![goal]);
    }
    if !grid.in_bounds(goal) {
        return PathOutcome::failed();
    }
    best_first(grid, start, options, Some(goal), &|cell: Cell| cell == goal)
}

/// Uniform-cost search that stops at the first expanded cell satisfying `is_goal`: the
/// cheapest reachable such cell, not the closest by distance.
pub fn dijkstras_nearest(
    grid: &Grid,
    start: Cell,
    is_goal: impl Fn(Cell) -> bool,
    options: &SearchOptions<'_>,
) -> PathOutcome {
    if is_goal(start) {
        return PathOutcome::found(vec![start]);
    }
    best_first(grid, start, options, None, &is_goal)
}

fn best_first(
    grid: &Grid,
    start: Cell,
    options: &SearchOptions<'_>,
    target: Option<Cell>,
    is_goal: &dyn Fn(Cell) -> bool,
) -> PathOutcome {
    let Some(start_idx) = grid.index(start) else {
        return PathOutcome::failed();
    };

    let len = grid.cell_count();
    let mut cost_so_far = vec![u64::MAX; len];
    let mut came_from: Vec<Option<usize>> = vec![None; len];
    let mut open = BinaryHeap::<OpenNode>::new();
    let mut seq: u64 = 0;
    let mut expanded = 0usize;

    cost_so_far[start_idx] = 0;
    open.push(OpenNode {
        priority: 0.0,
        seq,
        g: 0,
        idx: start_idx,
    });
    seq += 1;

    while let Some(node) = open.pop() {
        if node.g != cost_so_far[node.idx] {
            // Stale heap entry.
            continue;
        }
        expanded += 1;

        let cell = grid.cell_at(node.idx);
        if is_goal(cell) {
            trace!(%start, goal = %cell, expanded, cost = node.g, "search succeeded");
            return PathOutcome::found(reconstruct(
                |c| {
                    grid.index(c)
                        .and_then(|i| came_from[i])
                        .map(|i| grid.cell_at(i))
                },
                start,
                cell,
            ));
        }

        for next in grid.neighbours(cell, options.adjacency, options.filter) {
            let Some(next_idx) = grid.index(next) else {
                continue;
            };
            let g = node.g.saturating_add(u64::from(grid.cost(next)));
            if g >= cost_so_far[next_idx] {
                continue;
            }

            cost_so_far[next_idx] = g;
            came_from[next_idx] = Some(node.idx);
            let mut priority = g as f64;
            if let Some(target) = target {
                priority += options.cost_multiplier * options.heuristic.estimate(next, target);
            }
            open.push(OpenNode {
                priority,
                seq,
                g,
                idx: next_idx,
            });
            seq += 1;
        }
    }

    trace!(%start, expanded, "search exhausted frontier");
    PathOutcome::failed()
}

/// Walk parent links back from `goal` to `start` and return the path in start-to-goal order.
/// A broken chain yields an empty path.
pub fn reconstruct(
    parent_of: impl Fn(Cell) -> Option<Cell>,
    start: Cell,
    goal: Cell,
) -> Vec<Cell> {
    let mut path = vec![goal];
    let mut node = goal;
    while node != start {
        match parent_of(node) {
            Some(parent) => {
                node = parent;
                path.push(node);
            }
            None => return Vec::new(),
        }
    }
    path.reverse();
    path
}

/// Unweighted connectivity search: breadth-first with a queue, depth-first with a stack.
/// Ignores weights and the heuristic.
pub fn brute_force_search(
    grid: &Grid,
    start: Cell,
    goal: Cell,
    breadth_first: bool,
    options: &SearchOptions<'_>,
) -> PathOutcome {
    if start == goal {
        return PathOutcome::found(vec![goal]);
    }
    let Some(start_idx) = grid.index(start) else {
        return PathOutcome::failed();
    };

    let len = grid.cell_count();
    let mut came_from: Vec<Option<usize>> = vec![None; len];
    let mut seen = vec![false; len];
    seen[start_idx] = true;

    let mut edges = VecDeque::from([start]);
    loop {
        let next = if breadth_first {
            edges.pop_front()
        } else {
            edges.pop_back()
        };
        let Some(cell) = next else { break };

        if cell == goal {
            return PathOutcome::found(reconstruct(
                |c| {
                    grid.index(c)
                        .and_then(|i| came_from[i])
                        .map(|i| grid.cell_at(i))
                },
                start,
                goal,
            ));
        }

        let Some(cell_idx) = grid.index(cell) else {
            continue;
        };
        for neighbour in grid.neighbours(cell, options.adjacency, options.filter) {
            let Some(idx) = grid.index(neighbour) else {
                continue;
            };
            if !seen[idx] {
                seen[idx] = true;
                came_from[idx] = Some(cell_idx);
                edges.push_back(neighbour);
            }
        }
    }

    PathOutcome::failed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_nodes_pop_by_priority_then_insertion() {
        let mut heap = BinaryHeap::new();
        for (seq, priority) in [(0, 2.0), (1, 1.0), (2, 1.0), (3, 0.5)] {
            heap.push(OpenNode {
                priority,
                seq,
                g: 0,
                idx: seq as usize,
            });
        }
        let order: Vec<u64> = std::iter::from_fn(|| heap.pop().map(|n| n.seq)).collect();
        assert_eq!(order, vec![3, 1, 2, 0]);
    }

    #[test]
    fn reconstruct_reports_broken_chains_as_empty() {
        let start = Cell::new(0, 0);
        let goal = Cell::new(2, 0);
        let path = reconstruct(
            |c| (c.x > 0).then(|| Cell::new(c.x - 1, c.y)),
            start,
            goal,
        );
        assert_eq!(path, vec![start, Cell::new(1, 0), goal]);

        assert!(reconstruct(|_| None, start, goal).is_empty());
        assert_eq!(reconstruct(|_| None, start, start), vec![start]);
    }
}
