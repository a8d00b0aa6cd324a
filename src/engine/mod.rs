// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! The rule-inference engine.
//!
//! [`Engine`] owns every piece of mutable state of a run (the unified
//! cell graph, the shortcut database, the per-shape analyzers, the
//! code table, the side cache and the working set) with an explicit
//! lifetime: everything is dropped or reset by [`Engine::cleanup`].
//!
//! # Control flow
//!
//! [`Engine::generate`] seeds one origin cell per shape (or as configured),
//! then repeatedly runs a *rules iteration*: refresh the codes of the
//! working set of important cells, assign provisional rules, and verify
//! all pairs of adjacent live branches. Recoverable inconsistencies
//! (solid-distance errors, code mismatches, branch conflicts) surface as
//! [`GenError::Retry`] after extending the working set, the analyzers or
//! the shortcut database; the driver loops until an iteration runs clean
//! or a budget is exhausted. On every power-of-two attempt count the
//! derived data (analyzers, side cache, parent directions) is cleansed to
//! escape stale local optima.
//!
//! # Submodules
//!
//! Each submodule contributes one component as an `impl Engine` block:
//! topology (lazy graph growth and unification), distance maintenance,
//! shortcuts, parent selection, the side oracle, analyzers and codes, the
//! per-iteration rule pass, branch verification, and minimisation.

pub(crate) mod analyzer;
pub(crate) mod branch;
pub(crate) mod distance;
pub(crate) mod iteration;
pub(crate) mod minimize;
pub(crate) mod parent;
pub(crate) mod shortcut;
pub(crate) mod side;
pub(crate) mod topology;

use std::collections::VecDeque;
use std::time::Instant;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::config::{Config, SeedMode};
use crate::error::{failure, surrender, GenError, GenResult};
use crate::external::{ExternalHandle, ExternalMap};
use crate::graph::{Cell, CellId, CellStore, Walker};
use crate::rules::{compute_possible_parents, Rule, RuleSet, TreeState};
use crate::stats::{Counter, RunStats};
use crate::tiling::Tiling;

pub(crate) use analyzer::{Aid, Analyzer, Code};
pub(crate) use topology::FixOp;

/// One inferred state, as tracked during the run.
#[derive(Debug, Clone)]
pub(crate) struct StateInfo {
    pub id: usize,
    /// The rule vector has been generated at least once.
    pub known: bool,
    pub rules: Vec<Rule>,
    /// Canonical parent-oriented walker this state's rules were read from.
    pub giver: Option<Walker>,
    pub sid: usize,
    pub parent_dir: usize,
    /// Where this code was first seen; re-examined if the state is still
    /// unknown at the end of a pass.
    pub where_seen: Walker,
    pub code: Code,
    pub is_live: bool,
    pub is_root: bool,
}

/// Key identifying one branch conflict: the offending edge and expected
/// state, and the code actually found.
pub(crate) type ConflictKey = ((usize, usize), (usize, usize));

/// The rule-inference engine. See the module documentation.
pub struct Engine {
    pub(crate) tiling: Tiling,
    pub(crate) cfg: Config,
    pub(crate) cells: CellStore,

    pub(crate) fix_queue: VecDeque<FixOp>,
    pub(crate) in_fixing: bool,
    pub(crate) bfs_queue: VecDeque<CellId>,

    pub(crate) origins: Vec<Walker>,
    pub(crate) external: Option<Box<dyn ExternalMap>>,
    pub(crate) ext_of: FxHashMap<CellId, ExternalHandle>,
    pub(crate) cell_of_ext: FxHashMap<ExternalHandle, CellId>,

    pub(crate) shortcuts: FxHashMap<usize, Vec<shortcut::Shortcut>>,
    pub(crate) sidecache: FxHashMap<Walker, i32>,
    pub(crate) analyzers: FxHashMap<Aid, Analyzer>,
    pub(crate) code_to_id: FxHashMap<Code, usize>,
    pub(crate) states: Vec<StateInfo>,
    pub(crate) rule_root: usize,

    /// Working set of cells whose rules must be refreshed each iteration.
    pub(crate) important: Vec<Walker>,
    pub(crate) single_live_branch_near_root: FxHashSet<CellId>,
    pub(crate) verified_branches: FxHashSet<Vec<(i64, i64)>>,
    pub(crate) branch_conflicts_seen: FxHashSet<ConflictKey>,

    /// Solid errors since the last check.
    pub(crate) solid_errors: u32,
    pub(crate) parent_updates: u32,
    pub(crate) single_live_branches: u32,
    pub(crate) double_live_branches: u32,
    pub(crate) states_premini: usize,
    pub(crate) try_count: u32,
    pub(crate) counters: RunStats,
    pub(crate) started: Instant,
}

impl Engine {
    /// An engine over a tiling description.
    pub fn new(tiling: Tiling, cfg: Config) -> Self {
        Self {
            tiling,
            cfg,
            cells: CellStore::new(),
            fix_queue: VecDeque::new(),
            in_fixing: false,
            bfs_queue: VecDeque::new(),
            origins: Vec::new(),
            external: None,
            ext_of: FxHashMap::default(),
            cell_of_ext: FxHashMap::default(),
            shortcuts: FxHashMap::default(),
            sidecache: FxHashMap::default(),
            analyzers: FxHashMap::default(),
            code_to_id: FxHashMap::default(),
            states: Vec::new(),
            rule_root: 0,
            important: Vec::new(),
            single_live_branch_near_root: FxHashSet::default(),
            verified_branches: FxHashSet::default(),
            branch_conflicts_seen: FxHashSet::default(),
            solid_errors: 0,
            parent_updates: 0,
            single_live_branches: 0,
            double_live_branches: 0,
            states_premini: 0,
            try_count: 0,
            counters: RunStats::new(),
            started: Instant::now(),
        }
    }

    /// An engine resolving neighbours through an external map
    /// (numerical fallback mode). Pair with [`SeedMode::External`].
    pub fn with_external(tiling: Tiling, cfg: Config, map: Box<dyn ExternalMap>) -> Self {
        let mut e = Self::new(tiling, cfg);
        e.external = Some(map);
        e
    }

    /// Run rule inference to completion.
    ///
    /// Returns the finished rule set, or a [`GenError::Surrender`] when a
    /// budget is exhausted (timeout, cell cap, retry cap) or a
    /// [`GenError::Failure`] on an internal inconsistency. The cell graph
    /// survives a successful run for inspection; call [`Engine::cleanup`]
    /// to release it.
    pub fn generate(&mut self) -> GenResult<RuleSet> {
        self.started = Instant::now();
        self.reset();
        if self.tiling.has_mirrors() {
            return Err(surrender("mirror connections not implemented"));
        }
        self.seed_origins()?;
        if self.cfg.strategy.bfs {
            for o in self.origins.clone() {
                self.bfs_queue.push_back(o.cell);
            }
        }
        self.try_count = 0;
        self.important = self.origins.clone();

        loop {
            self.check_timeout()?;
            match self.rules_iteration() {
                Ok(()) => break,
                Err(GenError::Retry(msg)) => {
                    debug!(attempt = self.try_count, %msg, "iteration retried");
                    if self.try_count >= self.cfg.max_retries {
                        return Err(surrender(format!("max_retries exceeded: {msg}")));
                    }
                }
                Err(e) => return Err(e),
            }
        }
        debug!(
            states = self.states.len(),
            states_premini = self.states_premini,
            cells = self.cells.len(),
            single_live_branches = self.single_live_branches,
            double_live_branches = self.double_live_branches,
            "rules generated"
        );
        Ok(self.export_rules())
    }

    /// Release every cell and all derived tables.
    ///
    /// After cleanup no cell node remains reachable; the engine can be
    /// reused for another [`Engine::generate`] call.
    pub fn cleanup(&mut self) {
        self.reset();
    }

    /// Number of cells currently in the graph (including unified ones).
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> &RunStats {
        &self.counters
    }

    fn reset(&mut self) {
        self.cells.clear();
        self.fix_queue.clear();
        self.in_fixing = false;
        self.bfs_queue.clear();
        self.origins.clear();
        self.ext_of.clear();
        self.cell_of_ext.clear();
        self.shortcuts.clear();
        self.sidecache.clear();
        self.analyzers.clear();
        self.code_to_id.clear();
        self.states.clear();
        self.rule_root = 0;
        self.important.clear();
        self.single_live_branch_near_root.clear();
        self.verified_branches.clear();
        self.branch_conflicts_seen.clear();
        self.solid_errors = 0;
        self.parent_updates = 0;
        self.single_live_branches = 0;
        self.double_live_branches = 0;
        self.states_premini = 0;
        self.try_count = 0;
        self.counters.reset();
    }

    fn seed_origins(&mut self) -> GenResult<()> {
        match self.cfg.seed {
            SeedMode::AllShapes => {
                for sid in 0..self.tiling.shapes().len() {
                    let c = self.alloc_cell(sid);
                    self.cells.cell_mut(c).dist = Some(0);
                    self.origins.push(Walker::new(c, 0));
                }
            }
            SeedMode::SingleShape(sid) => {
                if sid >= self.tiling.shapes().len() {
                    return Err(failure(format!("origin shape {sid} not in the catalogue")));
                }
                let c = self.alloc_cell(sid);
                self.cells.cell_mut(c).dist = Some(0);
                self.origins.push(Walker::new(c, 0));
            }
            SeedMode::External => {
                let Some(ext) = self.external.as_mut() else {
                    return Err(failure("external seeding without an external map"));
                };
                let seeds = ext.origins();
                if seeds.is_empty() {
                    return Err(failure("external map reported no origins"));
                }
                for seed in seeds {
                    if seed.shape >= self.tiling.shapes().len() {
                        return Err(failure(format!(
                            "external origin shape {} not in the catalogue",
                            seed.shape
                        )));
                    }
                    let c = self.alloc_cell(seed.shape);
                    self.cells.cell_mut(c).dist = Some(0);
                    self.ext_of.insert(c, seed.cell);
                    self.cell_of_ext.insert(seed.cell, c);
                    self.origins.push(Walker::new(c, 0));
                }
            }
        }
        Ok(())
    }

    fn export_rules(&self) -> RuleSet {
        let mut states: Vec<TreeState> = self
            .states
            .iter()
            .map(|s| TreeState {
                id: s.id,
                sid: s.sid,
                parent_dir: s.parent_dir,
                rules: s.rules.clone(),
                is_root: s.is_root,
                is_live: s.is_live,
                is_possible_parent: false,
                possible_parents: Vec::new(),
            })
            .collect();
        compute_possible_parents(&mut states);
        RuleSet {
            states,
            rule_root: self.rule_root,
            stats: self.counters.clone(),
        }
    }

    pub(crate) fn check_timeout(&self) -> GenResult<()> {
        if self.started.elapsed() >= self.cfg.rulegen_timeout {
            return Err(surrender("timeout"));
        }
        Ok(())
    }

    pub(crate) fn alloc_cell(&mut self, shape: usize) -> CellId {
        let valence = self.tiling.shape(shape).valence();
        self.counters.inc(Counter::CellsCreated);
        self.cells.alloc(shape, valence)
    }

    // Short accessors used throughout the engine impls.

    pub(crate) fn cell(&self, id: CellId) -> &Cell {
        self.cells.cell(id)
    }

    pub(crate) fn cell_mut(&mut self, id: CellId) -> &mut Cell {
        self.cells.cell_mut(id)
    }

    pub(crate) fn rot(&self, w: Walker, delta: i64) -> Walker {
        self.cells.rot(w, delta)
    }

    pub(crate) fn peek(&self, w: Walker) -> Option<Walker> {
        self.cells.peek(w)
    }

    pub(crate) fn canon(&mut self, w: Walker) -> Walker {
        self.cells.canon(w)
    }

    pub(crate) fn canon_cell(&mut self, c: CellId) -> CellId {
        self.cells.canon_cell(c)
    }

    pub(crate) fn valence(&self, c: CellId) -> usize {
        self.cell(c).valence
    }

    pub(crate) fn cycle_of(&self, c: CellId) -> usize {
        self.tiling.shape(self.cell(c).shape).cycle_length
    }

    pub(crate) fn dist_req(&self, c: CellId) -> GenResult<u32> {
        self.cell(c)
            .dist
            .ok_or_else(|| failure("distance unexpectedly unknown"))
    }
}

/// Generate tree rules for a tiling with the given configuration.
///
/// Convenience wrapper constructing a fresh [`Engine`].
pub fn generate(tiling: &Tiling, cfg: &Config) -> GenResult<RuleSet> {
    Engine::new(tiling.clone(), cfg.clone()).generate()
}

impl Engine {
    /// Check the universal graph invariants on the current cell graph:
    /// mutual adjacency, and the distance certificate of every cell whose
    /// distance was fixed. Used by tests.
    #[doc(hidden)]
    pub fn verify_graph(&self) -> Result<(), String> {
        for id in self.cells.ids() {
            let c = self.cell(id);
            if !self.cells.is_canonical(id) {
                continue;
            }
            for (i, e) in c.nbr.iter().enumerate() {
                let Some(e) = e else { continue };
                let back = self.cell(e.cell).nbr[e.spin];
                if back != Some(crate::graph::EdgeTo { cell: id, spin: i }) {
                    return Err(format!(
                        "edge {i} of cell {} is not mirrored by its neighbour",
                        id.index()
                    ));
                }
            }
            if c.distance_fixed {
                if let (Some(d), Some(an)) = (c.dist, c.any_nearer) {
                    if d > 0 {
                        if let Some(e) = c.nbr[an] {
                            let nd = self.cell(e.cell).dist;
                            if nd != Some(d - 1) {
                                return Err(format!(
                                    "cell {} at distance {d} certifies a neighbour at {nd:?}",
                                    id.index()
                                ));
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
