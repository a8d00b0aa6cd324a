// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Common helpers shared across integration tests.
#![allow(dead_code)] // each test binary uses a different subset

use tiling_trees::{Rule, RuleSet, Tiling};

/// Opt-in log output: set `RUST_LOG=tiling_trees=debug` to watch a run.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// The hyperbolic tiling of heptagons, three around each vertex.
pub fn heptagonal() -> Tiling {
    Tiling::regular(7, 3)
}

/// The hyperbolic tiling of pentagons, four around each vertex.
pub fn pentagonal() -> Tiling {
    Tiling::regular(5, 4)
}

/// The Euclidean square grid.
pub fn square() -> Tiling {
    Tiling::regular(4, 4)
}

/// Token counts of one state: (shape, parents, lefts, rights, children).
pub fn state_signature(rules: &[Rule], sid: usize) -> (usize, usize, usize, usize, usize) {
    let count = |t: Rule| rules.iter().filter(|r| **r == t).count();
    let children = rules.iter().filter(|r| r.child().is_some()).count();
    (
        sid,
        count(Rule::Parent),
        count(Rule::Left),
        count(Rule::Right),
        children,
    )
}

/// A renumbering-independent fingerprint of a rule set.
pub fn signature(rs: &RuleSet) -> Vec<(usize, usize, usize, usize, usize)> {
    let mut sig: Vec<_> = rs
        .states
        .iter()
        .map(|ts| state_signature(&ts.rules, ts.sid))
        .collect();
    sig.sort_unstable();
    sig
}

/// Every live state must be reachable from the root along child rules.
pub fn assert_live_states_reachable(rs: &RuleSet) {
    let mut seen = vec![false; rs.states.len()];
    let mut stack = vec![rs.rule_root];
    seen[rs.rule_root] = true;
    while let Some(id) = stack.pop() {
        for r in &rs.states[id].rules {
            if let Some(s) = r.child() {
                if !seen[s] {
                    seen[s] = true;
                    stack.push(s);
                }
            }
        }
    }
    for ts in &rs.states {
        if ts.is_live {
            assert!(
                seen[ts.id],
                "live state {} unreachable from the root",
                ts.id
            );
        }
    }
}
