// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Branch examination.
//!
//! For every live state, every pair of cyclically adjacent live child
//! edges spawns two branches that grow away from each other; the tiling
//! only closes up if the cells between them always meet consistently.
//! [`Engine::examine_branch`] walks the two inner boundaries outward in
//! lockstep, matching LEFT tokens on one side against RIGHT tokens on the
//! other. A configuration is proven terminating when its *dead-stack*
//! canonical form (the chain of state/spin pairs up to the nearest live
//! sibling or root on each side, plus the distance differential) has
//! been verified before.
//!
//! Every advance re-reads the state across the edge and compares it with
//! the rule's prediction; a mismatch is a *branch conflict*, which adds
//! the offending cell to the working set and ends the examination.

use tracing::debug;

use crate::error::{failure, retry, GenError, GenResult};
use crate::graph::{gmod, Walker};
use crate::rules::Rule;

use super::{ConflictKey, Engine};

/// A state id and the spin relative to that state's parent edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TsInfo {
    pub state: usize,
    pub spin: i64,
}

/// Why an examination stopped early.
enum Interrupt {
    /// A branch conflict was recorded; the examination is abandoned.
    Conflict,
    Gen(GenError),
}

impl From<GenError> for Interrupt {
    fn from(e: GenError) -> Self {
        Interrupt::Gen(e)
    }
}

impl Engine {
    /// The state and relative spin of a walker.
    pub(crate) fn tsinfo(&mut self, tw: &mut Walker) -> GenResult<TsInfo> {
        let (pd, id) = self.code_of(tw)?;
        let spin = gmod(tw.spin as i64 - pd as i64, self.valence(tw.cell)) as i64;
        Ok(TsInfo { state: id, spin })
    }

    /// The rule at a walker's relative spin; unknown rules enqueue the
    /// cell as important and retry.
    fn rule_at(&mut self, tw: Walker, s: TsInfo) -> GenResult<Rule> {
        let rules = &self.states[s.state].rules;
        if rules.is_empty() {
            self.important.push(Walker::new(tw.cell, 0));
            return Err(retry("rule not yet known"));
        }
        let idx = usize::try_from(s.spin).map_err(|_| failure("negative rule spin"))?;
        rules
            .get(idx)
            .copied()
            .ok_or_else(|| failure("rule spin out of range"))
    }

    /// Append the dead-stack canonical form of one branch end to `hash`.
    ///
    /// Starting from the walker's state/spin pair, move in the branch
    /// direction; on crossing the rule-vector boundary, step to the
    /// parent and continue there. Stop at a root or at a live sibling.
    fn push_dead_stack(
        &mut self,
        hash: &mut Vec<(i64, i64)>,
        mut w: Walker,
        mut tsi: TsInfo,
        dir: i64,
    ) -> GenResult<()> {
        hash.push((tsi.state as i64, tsi.spin));
        loop {
            w = self.canon(w);
            if hash.len() > 10_000 {
                return Err(failure("dead stack overflow"));
            }
            tsi.spin += dir;
            w = self.rot(w, dir);
            if self.states[tsi.state].is_root {
                return Ok(());
            }
            let rlen = self.states[tsi.state].rules.len() as i64;
            if tsi.spin == 0 || tsi.spin == rlen {
                w = self.step(w)?;
                tsi = self.tsinfo(&mut w)?;
                hash.push((tsi.state as i64, tsi.spin));
            } else {
                if self.states[tsi.state].rules.is_empty() {
                    return Err(retry("rule not yet known"));
                }
                let idx =
                    usize::try_from(tsi.spin).map_err(|_| failure("dead-stack spin underflow"))?;
                let r = self.states[tsi.state]
                    .rules
                    .get(idx)
                    .copied()
                    .ok_or_else(|| failure("dead-stack spin overflow"))?;
                if let Rule::Child(s) = r {
                    if s > 0 && self.states[s].is_live {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Advance a branch walker one treewalk step, first verifying that
    /// the cell across the edge carries the state the rule predicts.
    fn verified_treewalk(
        &mut self,
        tw: &mut Walker,
        rule: Rule,
        dir: i64,
    ) -> Result<(), Interrupt> {
        if let Rule::Child(expect) = rule {
            let fresh = self.step(*tw)?;
            let mut tw1 = fresh;
            let (got_dir, got) = self.code_of(&mut tw1)?;
            if got != expect || got_dir != tw1.spin {
                self.check_solid_errors()?;
                let key: ConflictKey = ((fresh.spin, expect), (got_dir, got));
                if self.cfg.strategy.examine_all || !self.branch_conflicts_seen.contains(&key) {
                    self.branch_conflicts_seen.insert(key);
                    self.important.push(Walker::new(tw.cell, 0));
                    debug!(?key, "branch conflict");
                }
                return Err(Interrupt::Conflict);
            }
        }
        self.treewalk(tw, dir)?;
        Ok(())
    }

    /// Prove that the branches at child edges `left` and `right` of state
    /// `id` grow apart consistently.
    pub(crate) fn examine_branch(&mut self, id: usize, left: i64, right: i64) -> GenResult<()> {
        match self.examine_branch_inner(id, left, right) {
            Ok(()) => Ok(()),
            Err(Interrupt::Conflict) => {
                if self.cfg.strategy.examine_once {
                    Err(retry("branch conflict"))
                } else {
                    Ok(())
                }
            }
            Err(Interrupt::Gen(e)) => Err(e),
        }
    }

    fn examine_branch_inner(&mut self, id: usize, left: i64, right: i64) -> Result<(), Interrupt> {
        let Some(rg) = self.states[id].giver else {
            return Err(failure("examined state has no giver").into());
        };
        debug!(state = id, left, right, "examining branches");

        let mut wl = self.rot(rg, left);
        let mut wr = self.rot(rg, left + 1);
        let mut lstack: Vec<Walker> = Vec::new();
        let mut rstack: Vec<Walker> = Vec::new();

        let mut steps: u32 = 0;
        loop {
            self.check_solid_errors()?;
            steps += 1;
            if steps > self.cfg.max_examine_branch {
                if !self.branch_conflicts_seen.is_empty() {
                    // possibly a knock-on effect of an earlier conflict
                    return Err(retry("branch examination exceeded its budget").into());
                }
                return Err(failure("branch examination exceeded its budget").into());
            }

            let tsl = self.tsinfo(&mut wl)?;
            let tsr = self.tsinfo(&mut wr)?;
            let rl = self.rule_at(wl, tsl)?;
            let rr = self.rule_at(wr, tsr)?;

            let lstack_matches = if rl == Rule::Right && !lstack.is_empty() {
                let top = *lstack.last().ok_or_else(|| failure("empty stack"))?;
                top == self.step(wl)?
            } else {
                false
            };
            let rstack_matches = if rr == Rule::Left && !rstack.is_empty() {
                let top = *rstack.last().ok_or_else(|| failure("empty stack"))?;
                top == self.step(wr)?
            } else {
                false
            };

            if rl == Rule::Right && rr == Rule::Left && lstack.is_empty() && rstack.is_empty() {
                let mut hash: Vec<(i64, i64)> = Vec::new();
                self.push_dead_stack(&mut hash, wl, tsl, -1)?;
                let dl = self.dist_req(wl.cell)? as i64;
                let dr = self.dist_req(wr.cell)? as i64;
                hash.push((-1, dl - dr));
                self.push_dead_stack(&mut hash, wr, tsr, 1)?;
                if self.verified_branches.contains(&hash) {
                    return Ok(());
                }
                self.verified_branches.insert(hash);
                self.verified_treewalk(&mut wl, rl, -1)?;
                self.verified_treewalk(&mut wr, rr, 1)?;
            } else if lstack_matches {
                lstack.pop();
                self.verified_treewalk(&mut wl, rl, -1)?;
            } else if rstack_matches {
                rstack.pop();
                self.verified_treewalk(&mut wr, rr, 1)?;
            } else if rl == Rule::Left {
                lstack.push(wl);
                self.verified_treewalk(&mut wl, rl, -1)?;
            } else if rr == Rule::Right {
                rstack.push(wr);
                self.verified_treewalk(&mut wr, rr, 1)?;
            } else if rl != Rule::Right {
                self.verified_treewalk(&mut wl, rl, -1)?;
            } else if rr != Rule::Right {
                self.verified_treewalk(&mut wr, rr, 1)?;
            } else {
                return Err(failure("branch examination cannot advance").into());
            }
        }
    }

    /// Walk the dead parts under a single-live-branch root, recording
    /// every visited cell in the near-root set (their side answers are
    /// unreliable) and forcing their rules to exist.
    pub(crate) fn find_single_live_branch(&mut self, at: &mut Walker) -> GenResult<()> {
        self.check_solid_errors()?;
        self.rules_iteration_for(at)?;
        let id = self.code_of(at)?.1;
        let t = self.valence(at.cell);
        let rules = self.states[id].rules.clone();
        if rules.is_empty() {
            self.important.push(Walker::new(at.cell, 0));
            return Err(retry("rule not yet known"));
        }
        let live_children = rules
            .iter()
            .filter_map(|r| r.child())
            .filter(|&s| self.states[s].is_live)
            .count();
        for i in 0..t {
            let Some(s) = rules[i].child() else { continue };
            self.single_live_branch_near_root.insert(at.cell);
            if !self.states[s].is_live || live_children == 1 {
                let mut at1 = self.step(self.rot(*at, i as i64))?;
                self.find_single_live_branch(&mut at1)?;
            }
        }
        Ok(())
    }
}
