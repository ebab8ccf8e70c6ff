use crate::{Adjacency, Cell};

/// Estimate of the remaining cost between two cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Heuristic {
    /// No estimate: A* degenerates to uniform-cost search.
    None,
    Manhattan,
    /// Octile-style estimate for 8-way movement: straight steps cost 1, diagonal steps 1.4.
    #[default]
    Diagonal,
    Chebyshev,
    Euclidean,
}

impl Heuristic {
    /// The conventional choice for a given adjacency.
    pub fn for_adjacency(adjacency: Adjacency) -> Self {
        match adjacency {
            Adjacency::Four => Heuristic::Manhattan,
            Adjacency::Eight => Heuristic::Diagonal,
        }
    }

    pub fn estimate(self, from: Cell, to: Cell) -> f64 {
        let dx = f64::from(from.x.abs_diff(to.x));
        let dy = f64::from(from.y.abs_diff(to.y));
        match self {
            Heuristic::None => 0.0,
            Heuristic::Manhattan => dx + dy,
            Heuristic::Diagonal => (dx + dy) + (1.4 - 2.0) * dx.min(dy),
            Heuristic::Chebyshev => dx.max(dy),
            Heuristic::Euclidean => dx.hypot(dy),
        }
    }
}
