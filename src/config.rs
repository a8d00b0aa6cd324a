// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Engine configuration: budgets, origin seeding, and strategy flags.
//!
//! [`Config`] bundles the hard budgets that turn a runaway run into a
//! surrender, the origin-seeding mode, and the [`Strategy`] flag set.
//! Every strategy flag gates a single code path in the engine; the
//! defaults correspond to the strongest known combination, and the flags
//! mostly exist to cross-check the engine against its own weaker variants.

use std::time::Duration;

/// How the engine seeds origin cells at distance zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeedMode {
    /// One origin cell per distinct shape in the catalogue.
    #[default]
    AllShapes,
    /// A single origin cell of the given shape id.
    SingleShape(usize),
    /// Origins and neighbour resolution come from an external map
    /// (see [`crate::external::ExternalMap`]).
    External,
}

/// Strategy flags. Each gates one specific path in the engine.
///
/// All flags default to `false`; the default engine uses shortcuts, the
/// side cache, relative distances in codes, and the smart shortcut walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Strategy {
    /// Compute distances with a global BFS queue instead of lazy relaxation.
    pub bfs: bool,
    /// Do not learn or apply shortcuts.
    pub no_shortcuts: bool,
    /// Do not recursively solidify the nearer neighbour of a solid cell.
    pub near_solid: bool,
    /// Do not cleanse derived data on power-of-two retry counts.
    pub no_restart: bool,
    /// Do not cache side-oracle results.
    pub no_sidecache: bool,
    /// Emit only EQUAL-class entries instead of building relative
    /// distances into codes (loses discrimination).
    pub no_relative_distance: bool,
    /// Abort the whole examination phase at the first branch conflict.
    pub examine_once: bool,
    /// Record every branch conflict, even ones already seen.
    pub examine_all: bool,
    /// Keep scanning for further code mismatches after the first one.
    pub conflict_all: bool,
    /// Always resolve parents with the exhaustive comparison.
    pub parent_always: bool,
    /// Treat an ambiguous parent choice as a hard failure.
    pub parent_never: bool,
    /// Cleanse derived data after any solid-distance error.
    pub always_clean: bool,
    /// Skip the ancestor-merge fast path of the side oracle.
    pub slow_side: bool,
    /// Use the plain shortcut walk instead of the lazy smart walk.
    pub no_smart_shortcuts: bool,
    /// In the smart shortcut walk, keep retracing even when the old path
    /// is not materialised.
    pub less_smart_retrace: bool,
    /// In the smart shortcut walk, keep advancing even when the new path
    /// provably cannot shorten anything.
    pub less_smart_advance: bool,
    /// In external-map mode, close vertex rings around materialised cells.
    pub numerical_fix: bool,
    /// Trust distances reported by the external map instead of computing
    /// them.
    pub known_distances: bool,
}

/// Budgets and tunables for one rule-generation run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Rules iterations allowed before the run surrenders. Default: 999.
    pub max_retries: u32,
    /// Hard cap on cells in the unified graph; exceeding it surrenders
    /// with a diagnostic containing `max_tcellcount`. Default: 1_000_000.
    pub max_tcellcount: usize,
    /// Step budget for walks that resolve LEFT/RIGHT edges in a consumer
    /// map. Default: 100.
    pub max_adv_steps: u32,
    /// Step budget for one branch examination. Default: 5040.
    pub max_examine_branch: u32,
    /// Step budget for one side-oracle query. Default: 10_000.
    pub max_getside: u32,
    /// Wall-clock budget for the whole run. Default: 60 s.
    pub rulegen_timeout: Duration,
    /// Origin seeding mode.
    pub seed: SeedMode,
    /// Strategy flags.
    pub strategy: Strategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_retries: 999,
            max_tcellcount: 1_000_000,
            max_adv_steps: 100,
            max_examine_branch: 5040,
            max_getside: 10_000,
            rulegen_timeout: Duration::from_secs(60),
            seed: SeedMode::default(),
            strategy: Strategy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.max_retries, 999);
        assert_eq!(cfg.max_tcellcount, 1_000_000);
        assert_eq!(cfg.max_examine_branch, 5040);
        assert_eq!(cfg.seed, SeedMode::AllShapes);
        assert!(!cfg.strategy.bfs);
        assert!(!cfg.strategy.no_smart_shortcuts);
    }
}
