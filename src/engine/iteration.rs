// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! The per-iteration rule pass.
//!
//! One *rules iteration* recomputes every code from scratch (states and
//! the code map are derived data), generates a rule vector for each cell
//! of the working set, re-examines states still unknown afterwards,
//! propagates liveness, verifies all adjacent live branch pairs, and
//! minimises. Any inconsistency found on the way raises a retry after
//! leaving a hint behind: a grown analyzer, a new shortcut, or more
//! important cells.

use tracing::{debug, trace};

use crate::error::{failure, retry, GenResult};
use crate::graph::{ParentDir, Walker};
use crate::rules::Rule;
use crate::stats::Counter;

use super::analyzer::CodeEntry;
use super::Engine;

impl Engine {
    /// Generate the rule vector of the parent-oriented walker `cwmain`,
    /// whose state is `id`.
    fn build_rule_vector(&mut self, cwmain: Walker, id: usize) -> GenResult<Vec<Rule>> {
        let n = self.valence(cwmain.cell);
        let mut cids: Vec<Rule> = Vec::with_capacity(n);
        for a in 0..n {
            let front = self.rot(cwmain, a as i64);
            let mut c1 = self.step(front)?;
            self.be_solid(c1.cell)?;
            if a == 0 && self.cell(cwmain.cell).dist != Some(0) {
                cids.push(Rule::Parent);
                continue;
            }
            if self.dist_req(c1.cell)? <= self.dist_req(cwmain.cell)? {
                cids.push(Rule::Unknown);
                continue;
            }
            let (d1, id1) = self.code_of(&mut c1)?;
            // crossing back over the child's parent edge must return here
            let back = self.step(Walker::new(c1.cell, d1))?;
            if back.cell != cwmain.cell || back.spin != front.spin {
                cids.push(Rule::Unknown);
                continue;
            }
            cids.push(Rule::Child(id1));
        }

        // sideways edges resolve from the state's own code entries
        for (i, r) in cids.iter_mut().enumerate() {
            if *r != Rule::Unknown {
                continue;
            }
            match self.states[id].code.entries[i + 1].right_side() {
                Some(true) => *r = Rule::Right,
                Some(false) => *r = Rule::Left,
                None => {
                    debug!(edge = i, state = id, "unresolvable code entry");
                    return Err(retry("sideways edge with a non-sideways code entry"));
                }
            }
        }
        Ok(cids)
    }

    /// Compute the state and rules of one working-set cell, merging with
    /// what the state already knows and refining on disagreement.
    pub(crate) fn rules_iteration_for(&mut self, cw: &mut Walker) -> GenResult<()> {
        *cw = self.canon(*cw);
        let (d, id) = self.code_of(cw)?;
        let cwmain = self.canon(Walker::new(cw.cell, d));
        let cids = self.build_rule_vector(cwmain, id)?;

        if !self.states[id].known {
            let is_root = self.cell(cw.cell).dist == Some(0);
            let sid = self.cell(cwmain.cell).shape;
            let ts = &mut self.states[id];
            ts.known = true;
            ts.rules = cids;
            ts.giver = Some(cwmain);
            ts.sid = sid;
            ts.parent_dir = cwmain.spin;
            ts.is_root = is_root;
            return Ok(());
        }
        if self.states[id].rules == cids {
            return Ok(());
        }

        self.check_solid_errors()?;
        debug!(state = id, "rule vectors disagree");
        let mut mismatches = 0;
        for z in 0..cids.len() {
            let r_z = self.states[id].rules[z];
            if r_z == cids[z] {
                continue;
            }
            let (Some(s1), Some(s2)) = (r_z.child(), cids[z].child()) else {
                return Err(failure("conflicting sentinel rules for one state"));
            };
            let c1 = self.states[s1].code.entries.clone();
            let c2 = self.states[s2].code.entries.clone();
            if c1.len() != c2.len() {
                return Err(failure("conflicting codes of different lengths"));
            }
            for k in 0..c1.len() {
                if c1[k] == CodeEntry::Ignore || c2[k] == CodeEntry::Ignore {
                    continue;
                }
                if c1[k] != c2[k] {
                    trace!(edge = z, position = k, "code mismatch");
                    self.extend_analyzer(cwmain, z, k, mismatches)?;
                    mismatches += 1;
                    if !self.cfg.strategy.conflict_all {
                        return Err(retry("rule conflict"));
                    }
                }
            }
        }
        if mismatches > 0 {
            return Err(retry("rule conflict"));
        }
        Err(failure("rule vectors disagree but codes do not"))
    }

    /// Forget analyzers and reset the working set to the origins.
    pub(crate) fn clean_analysis(&mut self) {
        self.analyzers.clear();
        self.important = self.origins.clone();
    }

    /// [`Engine::clean_analysis`] plus dropping every cached parent
    /// direction and the side cache.
    pub(crate) fn clean_parents(&mut self) {
        self.clean_analysis();
        self.sidecache.clear();
        for id in self.cells.ids() {
            let c = self.cells.cell_mut(id);
            if matches!(c.parent_dir, ParentDir::Edge(_)) {
                c.old_parent_dir = c.parent_dir;
            }
            c.parent_dir = ParentDir::Unknown;
        }
    }

    /// Drop all states, the code map, and every cached code.
    fn clear_codes(&mut self) {
        self.states.clear();
        self.code_to_id.clear();
        for id in self.cells.ids() {
            self.cells.cell_mut(id).code = None;
        }
    }

    /// One full rules iteration. `Ok(())` means the rule set is complete
    /// and verified; a retry means the engine refined something and wants
    /// to run again.
    pub(crate) fn rules_iteration(&mut self) -> GenResult<()> {
        self.try_count += 1;
        self.counters.inc(Counter::Attempts);
        if (self.try_count & (self.try_count - 1)) == 0 && !self.cfg.strategy.no_restart {
            self.clean_analysis();
            self.clean_parents();
        }
        debug!(attempt = self.try_count, "rules iteration");

        self.clear_codes();
        self.parent_updates = 0;

        let mut cq = self.important.clone();
        for i in 0..cq.len() {
            let mut w = cq[i];
            self.rules_iteration_for(&mut w)?;
            cq[i] = w;
        }
        self.check_solid_errors()?;

        let mut o = self.origins[0];
        self.rule_root = self.code_of(&mut o)?.1;
        self.origins[0] = o;
        trace!(states = self.states.len(), root = self.rule_root, "codes assigned");

        let mut id = 0;
        while id < self.states.len() {
            if !self.states[id].known {
                let mut ws = self.states[id].where_seen;
                self.rules_iteration_for(&mut ws)?;
            }
            id += 1;
        }

        let important_before = self.important.len();
        self.propagate_liveness();

        self.check_solid_errors()?;
        self.verified_branches.clear();
        let branch_set_before = self.single_live_branch_near_root.len();
        self.single_live_branches = 0;
        self.double_live_branches = 0;
        self.branch_conflicts_seen.clear();

        // a dead root still spawns something; examine one of its branches
        // against itself
        let mut id = 0;
        while id < self.states.len() {
            if self.states[id].is_root && !self.states[id].is_live {
                for (i, r) in self.states[id].rules.clone().iter().enumerate() {
                    if r.child().is_some() {
                        self.examine_branch(id, i as i64, i as i64)?;
                        break;
                    }
                }
            }
            id += 1;
        }

        let mut id = 0;
        while id < self.states.len() {
            if !self.states[id].is_live {
                id += 1;
                continue;
            }
            let r = self.states[id].rules.clone();
            if r.is_empty() {
                id += 1;
                continue;
            }
            let mut first_live: Option<usize> = None;
            let mut last_live: Option<usize> = None;
            let mut qbranches = 0;
            for (i, e) in r.iter().enumerate() {
                if let Some(s) = e.child() {
                    if self.states[s].is_live {
                        if first_live.is_none() {
                            first_live = Some(i);
                        }
                        if let Some(last) = last_live {
                            self.examine_branch(id, last as i64, i as i64)?;
                        }
                        last_live = Some(i);
                        qbranches += 1;
                    }
                }
            }
            if qbranches == 2 {
                self.double_live_branches += 1;
            }
            if first_live == last_live && self.states[id].is_root {
                debug!(state = id, "root with a single live branch");
                self.single_live_branches += 1;
                let Some(giver) = self.states[id].giver else {
                    return Err(failure("live root without a giver"));
                };
                let mut g = giver;
                self.find_single_live_branch(&mut g)?;
                self.states[id].giver = Some(g);
            }
            if self.single_live_branch_near_root.len() != branch_set_before {
                self.sidecache.clear();
                return Err(retry("single-live-branch set changed"));
            }
            if self.states[id].is_root {
                if let (Some(first), Some(last)) = (first_live, last_live) {
                    self.examine_branch(id, last as i64, first as i64)?;
                }
            }
            id += 1;
        }

        for id in 0..self.states.len() {
            if self.states[id].giver.is_none() {
                let ws = self.states[id].where_seen;
                self.important.push(ws);
            }
        }

        self.check_solid_errors()?;
        if self.important.len() != important_before {
            return Err(retry("more rules needed after branch examination"));
        }

        self.minimize_rules()?;
        if self.important.len() != important_before {
            return Err(retry("more rules needed after minimisation"));
        }
        self.check_solid_errors()
    }

    /// Mark states with no live child as dead, to fixpoint.
    fn propagate_liveness(&mut self) {
        loop {
            let mut new_deadends = 0;
            for id in 0..self.states.len() {
                if !self.states[id].known || !self.states[id].is_live {
                    continue;
                }
                let live_children = self.states[id]
                    .rules
                    .iter()
                    .filter_map(|r| r.child())
                    .filter(|&s| self.states[s].is_live)
                    .count();
                if live_children == 0 {
                    self.states[id].is_live = false;
                    new_deadends += 1;
                }
            }
            trace!(new_deadends, "liveness pass");
            if new_deadends == 0 {
                break;
            }
        }
    }
}
