//! Text map loader.
//!
//! One row per line. Each character expands into a `scale x scale` block of cells:
//! `B` rock, `V` water, `G` swamp, `T` scattered trees, `.` or space plain ground.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use gridsim_fsm::SplitMix64;
use gridsim_nav::{Cell, Grid, GridError, Terrain};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum MapError {
    #[error("failed to read map {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("map has no rows")]
    Empty,

    #[error("unknown map symbol {symbol:?} at line {line}, column {column}")]
    UnknownSymbol {
        symbol: char,
        line: usize,
        column: usize,
    },

    #[error("map scale must be at least 1")]
    ZeroScale,

    #[error(transparent)]
    Grid(#[from] GridError),
}

/// How map characters expand into cells.
#[derive(Debug, Clone, Copy)]
pub struct MapOptions {
    pub scale: u32,
    pub trees_per_block: u32,
    pub seed: u64,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            scale: 1,
            trees_per_block: 5,
            seed: 0,
        }
    }
}

pub fn load_map(path: &Path, options: MapOptions) -> Result<Grid, MapError> {
    let text = std::fs::read_to_string(path).map_err(|source| MapError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let grid = parse_map(&text, options)?;
    debug!(
        path = %path.display(),
        width = grid.width(),
        height = grid.height(),
        "map loaded"
    );
    Ok(grid)
}

pub fn parse_map(text: &str, options: MapOptions) -> Result<Grid, MapError> {
    if options.scale == 0 {
        return Err(MapError::ZeroScale);
    }
    let mut rows: Vec<&str> = text.lines().collect();
    while rows.last().is_some_and(|row| row.trim().is_empty()) {
        rows.pop();
    }
    let width = rows.iter().map(|row| row.chars().count()).max().unwrap_or(0);
    if rows.is_empty() || width == 0 {
        return Err(MapError::Empty);
    }

    let scale = options.scale;
    let mut grid = Grid::new(width as u32 * scale, rows.len() as u32 * scale)?;
    let mut rng = SplitMix64::new(options.seed);

    for (y, row) in rows.iter().enumerate() {
        for (x, symbol) in row.chars().enumerate() {
            let origin = Cell::new((x as u32 * scale) as i32, (y as u32 * scale) as i32);
            match symbol {
                '.' | ' ' => {}
                'B' => grid.fill_block(origin, scale, Terrain::Rock, None)?,
                'V' => grid.fill_block(origin, scale, Terrain::Water, None)?,
                'G' => grid.fill_block(origin, scale, Terrain::Swamp, Some(2))?,
                'T' => grid.scatter_block(
                    origin,
                    scale,
                    Terrain::Tree,
                    None,
                    options.trees_per_block,
                    &mut rng,
                )?,
                _ => {
                    return Err(MapError::UnknownSymbol {
                        symbol,
                        line: y + 1,
                        column: x + 1,
                    })
                }
            }
        }
    }
    Ok(grid)
}

/// Number of cells of each terrain kind, keyed by display name.
pub fn terrain_counts(grid: &Grid) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for cell in grid.cells() {
        *counts.entry(grid.terrain(cell).to_string()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(scale: u32) -> MapOptions {
        MapOptions {
            scale,
            ..MapOptions::default()
        }
    }

    #[test]
    fn symbols_map_to_terrain() {
        let grid = parse_map("B.V\n G.\n", options(1)).unwrap();
        assert_eq!((grid.width(), grid.height()), (3, 2));
        assert_eq!(grid.terrain(Cell::new(0, 0)), Terrain::Rock);
        assert_eq!(grid.terrain(Cell::new(2, 0)), Terrain::Water);
        assert_eq!(grid.terrain(Cell::new(1, 1)), Terrain::Swamp);
        assert_eq!(grid.cost(Cell::new(1, 1)), 2);
        assert!(!grid.is_free(Cell::new(0, 0)));
        assert!(grid.is_free(Cell::new(0, 1)));
    }

    #[test]
    fn short_rows_are_padded_with_ground() {
        let grid = parse_map("..\n.\n...\n", options(1)).unwrap();
        assert_eq!((grid.width(), grid.height()), (3, 3));
        assert!(grid.is_free(Cell::new(2, 1)));
    }

    #[test]
    fn scale_expands_each_symbol() {
        let grid = parse_map(".B\n", options(3)).unwrap();
        assert_eq!((grid.width(), grid.height()), (6, 3));
        assert!(grid.is_free(Cell::new(2, 2)));
        assert!(!grid.is_free(Cell::new(3, 0)));
        assert!(!grid.is_free(Cell::new(5, 2)));
    }

    #[test]
    fn trees_are_scattered_within_their_block() {
        let options = MapOptions {
            scale: 4,
            trees_per_block: 3,
            seed: 11,
        };
        let grid = parse_map(".T\n", options).unwrap();
        let trees: Vec<Cell> = grid
            .cells()
            .filter(|&cell| grid.terrain(cell) == Terrain::Tree)
            .collect();
        assert!(!trees.is_empty() && trees.len() <= 3);
        assert!(trees.iter().all(|cell| cell.x >= 4));

        let again = parse_map(".T\n", options).unwrap();
        assert!(trees.iter().all(|&cell| again.terrain(cell) == Terrain::Tree));
    }

    #[test]
    fn blank_maps_are_rejected() {
        assert!(matches!(parse_map("", options(1)), Err(MapError::Empty)));
        assert!(matches!(parse_map("\n  \n", options(1)), Err(MapError::Empty)));
    }

    #[test]
    fn unknown_symbols_report_their_position() {
        let err = parse_map("..\n.X\n", options(1)).unwrap_err();
        assert!(matches!(
            err,
            MapError::UnknownSymbol {
                symbol: 'X',
                line: 2,
                column: 2
            }
        ));
    }

    #[test]
    fn zero_scale_is_rejected() {
        assert!(matches!(parse_map(".", options(0)), Err(MapError::ZeroScale)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_map(&dir.path().join("nope.txt"), MapOptions::default()).unwrap_err();
        assert!(matches!(err, MapError::Io { .. }));
    }

    #[test]
    fn counts_cover_every_cell() {
        let grid = parse_map("BB.\n", options(2)).unwrap();
        let counts = terrain_counts(&grid);
        assert_eq!(counts.values().sum::<usize>(), 12);
        assert_eq!(counts[&Terrain::Rock.to_string()], 8);
        assert_eq!(counts[&Terrain::Ground.to_string()], 4);
    }
}
