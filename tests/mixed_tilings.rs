// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Multi-shape tilings, rotational symmetry, and strategy cross-checks.

mod common;

use common::{assert_live_states_reachable, init_logging, pentagonal, signature};
use tiling_trees::{generate, Config, Tiling};

/// Two alternating shapes: states must exist for both, and every child
/// must sit on the other shape.
#[test]
fn test_alternating_shapes() {
    init_logging();
    let tiling = Tiling::alternating(4, 4);
    let rules = generate(&tiling, &Config::default()).unwrap();

    assert!(rules.states.iter().any(|ts| ts.sid == 0));
    assert!(rules.states.iter().any(|ts| ts.sid == 1));
    for ts in &rules.states {
        for r in &ts.rules {
            if let Some(s) = r.child() {
                assert_eq!(
                    rules.states[s].sid,
                    1 - ts.sid,
                    "child of a state on shape {} must sit on the other shape",
                    ts.sid
                );
            }
        }
    }
    assert_live_states_reachable(&rules);
}

/// Declaring the square's half-turn symmetry lets the engine identify
/// rotated duplicates; the result cannot be bigger than without it.
#[test]
fn test_half_cycle_collapses_states() {
    init_logging();
    let full = generate(&Tiling::regular(4, 4), &Config::default()).unwrap();
    let half = generate(&Tiling::regular_with_cycle(4, 4, 2), &Config::default()).unwrap();
    assert!(
        half.states.len() <= full.states.len(),
        "{} states with the symmetry vs {} without",
        half.states.len(),
        full.states.len()
    );
    assert_live_states_reachable(&half);
}

/// The smart and the plain shortcut walks must agree on the final rules.
#[test]
fn test_shortcut_modes_agree() {
    init_logging();
    let smart = generate(&pentagonal(), &Config::default()).unwrap();
    let mut cfg = Config::default();
    cfg.strategy.no_smart_shortcuts = true;
    let plain = generate(&pentagonal(), &cfg).unwrap();

    assert_eq!(smart.states.len(), plain.states.len());
    assert_eq!(signature(&smart), signature(&plain));
}

/// Disabling the side cache only costs time, never changes the answer.
#[test]
fn test_sidecache_is_transparent() {
    init_logging();
    let cached = generate(&pentagonal(), &Config::default()).unwrap();
    let mut cfg = Config::default();
    cfg.strategy.no_sidecache = true;
    let uncached = generate(&pentagonal(), &cfg).unwrap();
    assert_eq!(signature(&cached), signature(&uncached));
}
