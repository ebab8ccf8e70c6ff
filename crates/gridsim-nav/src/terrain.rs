use core::fmt;

/// Terrain kind stored per cell alongside its traversal weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Terrain {
    #[default]
    Ground,
    Rock,
    Water,
    Swamp,
    Tree,
    Stump,
    /// Application-defined terrain. Its default weight is 1.
    Custom(u16),
}

impl Terrain {
    /// Weight used by [`crate::Grid::set_tile`] when no explicit weight is given.
    /// Zero means impassable.
    pub fn default_weight(self) -> u32 {
        match self {
            Terrain::Ground | Terrain::Stump | Terrain::Custom(_) => 1,
            Terrain::Swamp => 2,
            Terrain::Rock | Terrain::Water | Terrain::Tree => 0,
        }
    }
}

impl fmt::Display for Terrain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terrain::Ground => f.write_str("ground"),
            Terrain::Rock => f.write_str("rock"),
            Terrain::Water => f.write_str("water"),
            Terrain::Swamp => f.write_str("swamp"),
            Terrain::Tree => f.write_str("tree"),
            Terrain::Stump => f.write_str("stump"),
            Terrain::Custom(id) => write!(f, "custom:{id}"),
        }
    }
}
