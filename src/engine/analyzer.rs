// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Analyzers and neighbourhood codes.
//!
//! An *analyzer* is a growable breadth-first pattern of walker positions,
//! one per `aid`, the pair of a shape id and the parent edge's residue
//! modulo the shape's cycle length. Replaying the analyzer against a
//! cell's parent-oriented walker visits a fixed neighbourhood and
//! classifies every position relative to the tree; the resulting vector is
//! the cell's *code*. Cells sharing a code share a state, so the code map
//! drives state deduplication.
//!
//! Analyzers start as the immediate neighbourhood and grow on demand:
//! when two cells of one state turn out to generate different rules, the
//! position that discriminates them is grafted onto the analyzer
//! ([`Engine::extend_analyzer`]), refining the state space.

use tracing::debug;

use crate::error::{failure, retry, GenResult};
use crate::graph::{gmod, ParentDir, Walker};

use super::{Engine, StateInfo};

/// Analyzer key: shape id and parent-edge residue.
pub(crate) type Aid = (usize, usize);

/// Classification of one analyzer position.
///
/// The `bool` on the distance classes records that the side oracle put
/// the position on the right side of its chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum CodeEntry {
    /// Positions below a non-child are not examined.
    Ignore,
    /// The position is a proper tree child of its predecessor.
    Child,
    /// A nearer neighbour level with the parent chain.
    Parent,
    /// A nearer neighbour off to one side.
    Uncle(bool),
    /// A neighbour at the same distance.
    Equal(bool),
    /// A farther neighbour.
    Nephew(bool),
}

impl CodeEntry {
    fn with_right(self) -> CodeEntry {
        match self {
            CodeEntry::Uncle(_) => CodeEntry::Uncle(true),
            CodeEntry::Equal(_) => CodeEntry::Equal(true),
            CodeEntry::Nephew(_) => CodeEntry::Nephew(true),
            other => other,
        }
    }

    /// The side bit, for the classes that carry one.
    pub(crate) fn right_side(self) -> Option<bool> {
        match self {
            CodeEntry::Uncle(r) | CodeEntry::Equal(r) | CodeEntry::Nephew(r) => Some(r),
            _ => None,
        }
    }
}

/// A cell's neighbourhood code: the analyzer key and one classification
/// per analyzer position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Code {
    pub aid: Aid,
    pub entries: Vec<CodeEntry>,
}

/// The growable walker pattern of one aid.
///
/// Position 0 is the parent-oriented root; every other position records
/// the parent position and the spin that reproduces it, plus a sample
/// walker from the cell that grew it.
#[derive(Debug, Clone, Default)]
pub(crate) struct Analyzer {
    pub sample: Vec<Walker>,
    pub parent_id: Vec<i32>,
    pub spin: Vec<i32>,
}

impl Analyzer {
    pub(crate) fn len(&self) -> usize {
        self.sample.len()
    }
}

impl Engine {
    /// The analyzer key of a parent-oriented walker.
    pub(crate) fn aid_of(&mut self, cw: Walker) -> GenResult<Aid> {
        let cw = self.canon(cw);
        let sid = self.cell(cw.cell).shape;
        let n = self.valence(cw.cell);
        let k = self.tiling.shape(sid).cycle_length;
        Ok((sid, gmod(-(cw.spin as i64), n) % k))
    }

    /// Get or create the analyzer for `cw`'s aid, seeding it with the
    /// immediate neighbourhood.
    pub(crate) fn ensure_analyzer(&mut self, cw: Walker) -> GenResult<Aid> {
        let aid = self.aid_of(cw)?;
        if self.analyzers.get(&aid).map_or(true, |a| a.sample.is_empty()) {
            let a = self.analyzers.entry(aid).or_default();
            a.sample.push(cw);
            a.parent_id.push(-1);
            a.spin.push(-1);
            for i in 0..self.valence(cw.cell) {
                self.analyzer_add_step(aid, 0, i as i64)?;
            }
        }
        Ok(aid)
    }

    /// Append one position: from position `pid`, rotate by `s` and cross.
    pub(crate) fn analyzer_add_step(&mut self, aid: Aid, pid: usize, s: i64) -> GenResult<()> {
        let base = self.analyzers[&aid].sample[pid];
        let cw = self.rot(base, s);
        let cw = self.canon(cw);
        let cw = self.step(cw)?;
        let a = self
            .analyzers
            .get_mut(&aid)
            .ok_or_else(|| failure("analyzer vanished while growing"))?;
        a.sample.push(cw);
        a.parent_id.push(pid as i32);
        a.spin.push(s as i32);
        Ok(())
    }

    /// Replay the analyzer against `cw`, materialising the visited
    /// neighbourhood.
    fn spread_analyzer(&mut self, aid: Aid, cw: Walker) -> GenResult<Vec<Walker>> {
        let n = self.analyzers[&aid].len();
        let mut res = Vec::with_capacity(n);
        res.push(cw);
        for i in 1..n {
            let pid = self.analyzers[&aid].parent_id[i] as usize;
            let s = self.analyzers[&aid].spin[i] as i64;
            let r = self.canon(res[pid]);
            res[pid] = r;
            let r1 = self.canon(self.rot(r, s));
            res.push(self.step(r1)?);
        }
        Ok(res)
    }

    /// Read the code of the parent-oriented walker `cw`.
    pub(crate) fn code_at(&mut self, cw: Walker) -> GenResult<Code> {
        let mut cw = self.canon(cw);
        let aid = self.ensure_analyzer(cw)?;
        let sprawl = self.spread_analyzer(aid, cw)?;
        let mut entries: Vec<CodeEntry> = Vec::with_capacity(sprawl.len());
        for (id, cs) in sprawl.into_iter().enumerate() {
            let mut cs = cs;
            self.be_solid(cs.cell)?;
            self.be_solid(cw.cell)?;
            cw = self.canon(cw);
            cs = self.canon(cs);
            let pid = self.analyzers[&aid].parent_id[id];
            let x = if pid > -1 && entries[pid as usize] != CodeEntry::Child {
                CodeEntry::Ignore
            } else if id == 0 {
                CodeEntry::Child
            } else {
                let mut child = false;
                if self.cell(cs.cell).dist != Some(0) {
                    let csd = self.parent_walker(&mut cs)?;
                    child = csd == Some(cs);
                }
                if child {
                    CodeEntry::Child
                } else {
                    let cs2 = self.step(cs)?;
                    cs = self.canon(cs);
                    let cs2 = self.canon(cs2);
                    self.be_solid(cs2.cell)?;
                    self.fix_distances(cs.cell)?;
                    let base = if !self.cfg.strategy.no_relative_distance {
                        let back = self
                            .peek(cs)
                            .ok_or_else(|| failure("analyzer position lost its edge"))?;
                        let y = self.dist_req(cs.cell)? as i64 - self.dist_req(back.cell)? as i64;
                        match y {
                            1 => CodeEntry::Nephew(false),
                            0 => CodeEntry::Equal(false),
                            -1 => CodeEntry::Uncle(false),
                            _ => {
                                return Err(failure(format!(
                                    "neighbouring distances differ by {y}"
                                )))
                            }
                        }
                    } else {
                        CodeEntry::Equal(false)
                    };
                    let gs = self.get_side(cs)?;
                    if gs == 0 && base == CodeEntry::Uncle(false) {
                        CodeEntry::Parent
                    } else if gs > 0 {
                        base.with_right()
                    } else {
                        base
                    }
                }
            };
            entries.push(x);
        }
        Ok(Code { aid, entries })
    }

    /// The `(parent edge, state id)` of a cell, interning new codes.
    ///
    /// The walker is canonicalised to the cell's parent direction first;
    /// a cell at distance 0 is read at spin 0. A fresh code mints a fresh
    /// state with an empty, unknown rule vector.
    pub(crate) fn code_of(&mut self, cw: &mut Walker) -> GenResult<(usize, usize)> {
        let c = cw.cell;
        if let Some(code) = self.cell(c).code {
            match self.cell(c).parent_dir {
                ParentDir::Edge(d) => return Ok((d, code)),
                ParentDir::Root => return Ok((0, code)),
                ParentDir::Unknown => {}
            }
        }

        self.be_solid(c)?;
        *cw = self.canon(*cw);
        let cd = if self.cell(cw.cell).dist == Some(0) {
            Walker::new(cw.cell, 0)
        } else {
            match self.parent_walker(cw)? {
                Some(p) => p,
                None => Walker::new(cw.cell, 0),
            }
        };

        let v = self.code_at(cd)?;
        let cd = self.canon(cd);
        if let Some(&id) = self.code_to_id.get(&v) {
            self.cell_mut(cd.cell).code = Some(id);
            return Ok((cd.spin, id));
        }

        let id = self.states.len();
        self.code_to_id.insert(v.clone(), id);
        let cdc = self.cell(cd.cell);
        if let Some(old) = cdc.code {
            if old != id || cdc.parent_dir != ParentDir::Edge(cd.spin) {
                return Err(retry("state cache went stale during code computation"));
            }
        }
        self.cell_mut(cd.cell).code = Some(id);
        self.states.push(StateInfo {
            id,
            known: false,
            rules: Vec::new(),
            giver: None,
            sid: self.cell(cd.cell).shape,
            parent_dir: cd.spin,
            where_seen: *cw,
            code: v,
            is_live: true,
            is_root: false,
        });
        Ok((cd.spin, id))
    }

    /// Graft the ancestry of the discriminating analyzer position of a
    /// conflicting child onto the target's analyzer, under edge `dir`.
    ///
    /// `pos` is the position of the first code disagreement in the
    /// child's analyzer; `mism` counts disagreements already handled for
    /// this conflict. An extension that adds no position cannot make
    /// progress, which is only legitimate when a unification got there
    /// first; report it as a retry.
    pub(crate) fn extend_analyzer(
        &mut self,
        cw_target: Walker,
        dir: usize,
        pos: usize,
        mism: usize,
    ) -> GenResult<()> {
        let cw_target = self.canon(cw_target);
        debug!(dir, pos, "extending analyzer");
        let cw_conflict = self.step(self.rot(cw_target, dir as i64))?;
        let a_target = self.ensure_analyzer(cw_target)?;
        let a_conflict = self.ensure_analyzer(cw_conflict)?;

        let mut spins_to_add: Vec<i32> = Vec::new();
        let mut k = pos;
        while k != 0 {
            spins_to_add.push(self.analyzers[&a_conflict].spin[k]);
            k = self.analyzers[&a_conflict].parent_id[k] as usize;
        }

        let mut gid = 1 + dir;
        let mut added = false;
        while let Some(spin) = spins_to_add.pop() {
            let mut next_gid: Option<usize> = None;
            {
                let a = &self.analyzers[&a_target];
                for i in 0..a.len() {
                    if a.parent_id[i] == gid as i32 && a.spin[i] == spin {
                        next_gid = Some(i);
                    }
                }
            }
            let next = match next_gid {
                Some(i) => i,
                None => {
                    let i = self.analyzers[&a_target].len();
                    self.analyzer_add_step(a_target, gid, spin as i64)?;
                    added = true;
                    i
                }
            };
            gid = next;
        }
        if mism == 0 && !added {
            return Err(retry("analyzer extension added nothing"));
        }
        Ok(())
    }
}
