use gridsim_nav::{
    a_star_search, brute_force_search, dijkstras_nearest, Adjacency, Cell, Grid, Heuristic,
    SearchOptions, Terrain,
};
use proptest::prelude::*;

/// Width, height, per-cell weights (0 = wall), start index, goal index.
fn arb_layout(max_weight: u32) -> impl Strategy<Value = (u32, u32, Vec<u32>, usize, usize)> {
    (2u32..10, 2u32..10).prop_flat_map(move |(w, h)| {
        let cells = (w * h) as usize;
        let weight = prop_oneof![
            1 => Just(0u32),
            3 => 1..=max_weight,
        ];
        (
            Just(w),
            Just(h),
            prop::collection::vec(weight, cells),
            0..cells,
            0..cells,
        )
    })
}

fn build(width: u32, height: u32, weights: &[u32]) -> Grid {
    let mut grid = Grid::new(width, height).unwrap();
    for (i, &weight) in weights.iter().enumerate() {
        let cell = cell_of(width, i);
        if weight == 0 {
            grid.set_tile(cell, Terrain::Rock, None).unwrap();
        } else if weight != 1 {
            grid.set_tile(cell, Terrain::Swamp, Some(weight)).unwrap();
        }
    }
    grid
}

fn cell_of(width: u32, idx: usize) -> Cell {
    Cell::new((idx % width as usize) as i32, (idx / width as usize) as i32)
}

fn uniform_case(
    (w, h, mut weights, s, g): (u32, u32, Vec<u32>, usize, usize),
) -> (Grid, Cell, Cell) {
    weights[s] = 1;
    weights[g] = 1;
    (build(w, h, &weights), cell_of(w, s), cell_of(w, g))
}

fn assert_walkable(grid: &Grid, path: &[Cell]) -> Result<(), TestCaseError> {
    for pair in path.windows(2) {
        prop_assert_eq!(pair[0].chebyshev(pair[1]), 1);
        prop_assert!(grid.is_free(pair[1]));
    }
    Ok(())
}

proptest! {
    #[test]
    fn a_star_matches_exhaustive_step_count_four_way(layout in arb_layout(1)) {
        let (grid, start, goal) = uniform_case(layout);
        let options = SearchOptions::new(Adjacency::Four).with_heuristic(Heuristic::Manhattan);

        let a_star = a_star_search(&grid, start, goal, &options);
        let bfs = brute_force_search(&grid, start, goal, true, &options);

        prop_assert_eq!(a_star.success, bfs.success);
        if a_star.success {
            prop_assert_eq!(a_star.path.len(), bfs.path.len());
            prop_assert_eq!(a_star.cost(&grid), (bfs.path.len() - 1) as u64);
            prop_assert_eq!(a_star.path.first(), Some(&start));
            prop_assert_eq!(a_star.goal(), Some(goal));
            assert_walkable(&grid, &a_star.path)?;
        } else {
            prop_assert!(a_star.path.is_empty());
        }
    }

    #[test]
    fn a_star_matches_exhaustive_step_count_eight_way(layout in arb_layout(1)) {
        let (grid, start, goal) = uniform_case(layout);
        let options = SearchOptions::new(Adjacency::Eight).with_heuristic(Heuristic::Chebyshev);

        let a_star = a_star_search(&grid, start, goal, &options);
        let bfs = brute_force_search(&grid, start, goal, true, &options);

        prop_assert_eq!(a_star.success, bfs.success);
        if a_star.success {
            prop_assert_eq!(a_star.path.len(), bfs.path.len());
            assert_walkable(&grid, &a_star.path)?;
        }
    }

    #[test]
    fn nearest_is_no_more_expensive_than_any_other_match(
        layout in arb_layout(4),
        goals in prop::collection::vec(0usize..100, 1..4),
    ) {
        let (w, h, weights, s, _) = layout;
        let grid = build(w, h, &weights);
        let start = cell_of(w, s);
        let cells = (w * h) as usize;
        let goals: Vec<Cell> = goals.into_iter().map(|i| cell_of(w, i % cells)).collect();
        let options = SearchOptions::new(Adjacency::Eight).with_heuristic(Heuristic::None);

        let nearest = dijkstras_nearest(&grid, start, |cell| goals.contains(&cell), &options);

        let best = goals
            .iter()
            .map(|&goal| a_star_search(&grid, start, goal, &options))
            .filter(|outcome| outcome.success)
            .map(|outcome| outcome.cost(&grid))
            .min();

        match best {
            Some(best) => {
                prop_assert!(nearest.success);
                prop_assert!(goals.contains(&nearest.goal().unwrap()));
                prop_assert_eq!(nearest.cost(&grid), best);
            }
            None => prop_assert!(!nearest.success),
        }
    }

    #[test]
    fn searches_are_deterministic(layout in arb_layout(3)) {
        let (w, h, weights, s, g) = layout;
        let grid = build(w, h, &weights);
        let options = SearchOptions::default();

        let first = a_star_search(&grid, cell_of(w, s), cell_of(w, g), &options);
        let second = a_star_search(&grid, cell_of(w, s), cell_of(w, g), &options);

        prop_assert_eq!(first, second);
    }
}
