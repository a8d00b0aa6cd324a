// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! End-to-end runs on regular tilings, plus budget boundary behaviour.

mod common;

use std::time::{Duration, Instant};

use common::{assert_live_states_reachable, heptagonal, init_logging, pentagonal, square};
use tiling_trees::{generate, Config, Engine, GenError, Rule, Tiling};

/// The classical heptagonal case: a handful of states, a root spawning
/// seven children, and binary-tree-ish interior states.
#[test]
fn test_heptagonal_rules() {
    init_logging();
    let rules = generate(&heptagonal(), &Config::default()).unwrap();

    assert!(
        rules.states.len() <= 10,
        "{} states for the heptagonal tiling",
        rules.states.len()
    );
    let root = &rules.states[rules.rule_root];
    assert!(root.is_root);
    assert_eq!(root.rules.len(), 7);
    assert!(
        root.rules.iter().all(|r| r.child().is_some()),
        "all seven root edges spawn children: {:?}",
        root.rules
    );

    for ts in rules.states.iter().filter(|ts| !ts.is_root) {
        assert_eq!(ts.rules[0], Rule::Parent, "PARENT sits at edge 0");
        let parents = ts.rules.iter().filter(|r| **r == Rule::Parent).count();
        assert_eq!(parents, 1, "exactly one PARENT in {:?}", ts.rules);
        let sides = ts
            .rules
            .iter()
            .filter(|r| matches!(**r, Rule::Left | Rule::Right))
            .count();
        let children = ts.rules.iter().filter(|r| r.child().is_some()).count();
        assert!(
            (sides == 2 || sides == 3) && children == 6 - sides,
            "unexpected interior state {:?}",
            ts.rules
        );
        assert!(ts.rules.contains(&Rule::Left));
        assert!(ts.rules.contains(&Rule::Right));
    }
    assert_live_states_reachable(&rules);
}

/// Order-4 pentagons: small state count, one PARENT per interior state.
#[test]
fn test_pentagonal_rules() {
    init_logging();
    let rules = generate(&pentagonal(), &Config::default()).unwrap();

    assert!(
        rules.states.len() <= 30,
        "{} states for the pentagonal tiling",
        rules.states.len()
    );
    for ts in &rules.states {
        let parents = ts.rules.iter().filter(|r| **r == Rule::Parent).count();
        if ts.is_root {
            assert_eq!(parents, 0);
        } else {
            assert_eq!(parents, 1, "state {}: {:?}", ts.id, ts.rules);
        }
    }
    assert_live_states_reachable(&rules);
}

/// The Euclidean square grid also yields a strict tree.
#[test]
fn test_square_grid_rules() {
    init_logging();
    let rules = generate(&square(), &Config::default()).unwrap();
    let root = &rules.states[rules.rule_root];
    assert_eq!(root.rules.len(), 4);
    assert!(root.rules.iter().all(|r| r.child().is_some()));
    assert_live_states_reachable(&rules);
}

/// Distances computed through the global breadth-first queue must still
/// produce a valid rule set.
#[test]
fn test_square_grid_with_bfs_distances() {
    init_logging();
    let mut cfg = Config::default();
    cfg.strategy.bfs = true;
    let rules = generate(&square(), &cfg).unwrap();
    for ts in rules.states.iter().filter(|ts| !ts.is_root) {
        assert_eq!(ts.rules[0], Rule::Parent);
    }
    assert_live_states_reachable(&rules);
}

/// A zero timeout surrenders before doing anything.
#[test]
fn test_zero_timeout_surrenders() {
    let mut cfg = Config::default();
    cfg.rulegen_timeout = Duration::ZERO;
    let err = generate(&heptagonal(), &cfg).unwrap_err();
    match err {
        GenError::Surrender(msg) => assert!(msg.contains("timeout"), "{msg}"),
        other => panic!("expected a surrender, got {other}"),
    }
}

/// A cell budget too small for the input surrenders promptly with a
/// diagnostic naming the budget, and cleanup releases every cell.
#[test]
fn test_cell_budget_surrenders() {
    init_logging();
    let mut cfg = Config::default();
    cfg.max_tcellcount = 1000;
    // three hundred stripes need three hundred origins; analysing them
    // blows through a thousand cells immediately
    let tiling = Tiling::striped_squares(300);
    let mut engine = Engine::new(tiling, cfg);

    let t0 = Instant::now();
    let err = engine.generate().unwrap_err();
    assert!(t0.elapsed() < Duration::from_secs(1), "surrender was not prompt");
    match err {
        GenError::Surrender(msg) => {
            assert!(msg.contains("max_tcellcount"), "{msg}")
        }
        other => panic!("expected a surrender, got {other}"),
    }
    assert!(engine.cell_count() > 0);
    engine.cleanup();
    assert_eq!(engine.cell_count(), 0, "cleanup must release every cell");
}

/// A single-origin run restricted to one shape still succeeds.
#[test]
fn test_single_origin() {
    init_logging();
    let mut cfg = Config::default();
    cfg.seed = tiling_trees::SeedMode::SingleShape(0);
    let rules = generate(&heptagonal(), &cfg).unwrap();
    let root = &rules.states[rules.rule_root];
    // by symmetry all seven children of the origin are the same state
    let first = root.rules[0].child().unwrap();
    assert!(
        root.rules.iter().all(|r| r.child() == Some(first)),
        "root children must be rotationally identified: {:?}",
        root.rules
    );
}
