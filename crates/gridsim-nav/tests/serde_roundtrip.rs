#![cfg(feature = "serde")]

use gridsim_nav::{Adjacency, Cell, Heuristic, PathOutcome, Terrain};

#[test]
fn path_outcome_roundtrips_via_serde() {
    let outcome = PathOutcome::found(vec![Cell::new(0, 0), Cell::new(1, 1), Cell::new(2, 1)]);

    let json = serde_json::to_string(&outcome).expect("serialize outcome");
    let back: PathOutcome = serde_json::from_str(&json).expect("deserialize outcome");

    assert_eq!(outcome, back);
}

#[test]
fn enums_use_snake_case_names() {
    assert_eq!(serde_json::to_string(&Terrain::Swamp).unwrap(), "\"swamp\"");
    assert_eq!(serde_json::to_string(&Adjacency::Four).unwrap(), "\"four\"");
    let heuristic: Heuristic = serde_json::from_str("\"chebyshev\"").unwrap();
    assert_eq!(heuristic, Heuristic::Chebyshev);
    let custom: Terrain = serde_json::from_str("{\"custom\":7}").unwrap();
    assert_eq!(custom, Terrain::Custom(7));
}
