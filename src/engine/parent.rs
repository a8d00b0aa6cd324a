// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Parent selection.
//!
//! Every cell at positive distance gets one canonical parent edge: among
//! the edges leading to strictly nearer neighbours, the one whose index is
//! minimal under the shape's rotational rank (`edge mod cycle_length`).
//! When several candidates share the minimal rank the cell is *confused*
//! and [`Engine::beats_exhaustive`] settles it by walking the candidate
//! parent chains upward until they first differ, which is guaranteed at
//! the origin, where the bare edge index decides.
//!
//! The choice is cached on the cell and invalidated whenever distances
//! drop. A cell whose choice changes from a previously recorded one
//! donates a shortcut against the old direction.

use crate::error::{failure, GenResult};
use crate::graph::{gmod, ParentDir, Walker};
use crate::stats::Counter;

use super::Engine;

/// Rank comparison for parent candidates: does `i` displace `old`?
fn beats(i: usize, old: Option<usize>, k: usize) -> bool {
    match old {
        None => true,
        Some(old) => {
            if i % k != old % k {
                i % k < old % k
            } else {
                true
            }
        }
    }
}

impl Engine {
    /// The canonical parent walker of `cw`'s cell, or `None` at the root.
    ///
    /// `cw` is canonicalised in place (possibly repeatedly, when the cell
    /// unifies while its neighbourhood is being solidified).
    pub(crate) fn parent_walker(&mut self, cw: &mut Walker) -> GenResult<Option<Walker>> {
        'restart: loop {
            *cw = self.canon(*cw);
            let c = cw.cell;
            match self.cell(c).parent_dir {
                ParentDir::Edge(d) => return Ok(Some(Walker::new(c, d))),
                ParentDir::Root => return Ok(None),
                ParentDir::Unknown => {}
            }
            self.be_solid(c)?;
            *cw = self.canon(*cw);
            if cw.cell != c {
                continue 'restart;
            }

            if self.cell(c).dist == Some(0) {
                self.cell_mut(c).parent_dir = ParentDir::Root;
                self.parent_updates += 1;
                self.counters.inc(Counter::ParentUpdates);
                return Ok(None);
            }

            let n = self.valence(c);
            let k = self.cycle_of(c);
            let d = self.dist_req(c)?;
            let mut nearer: Vec<usize> = Vec::new();
            for i in 0..n {
                self.ensure_shorter(self.rot(*cw, i as i64))?;
                let c1 = self.neighbor_cell(c, i)?;
                self.be_solid(c1)?;
                if self.cell(c1).dist.map_or(false, |d1| d1 < d) {
                    nearer.push(i);
                }
                *cw = self.canon(*cw);
                if cw.cell != c || self.cell(c).dist != Some(d) {
                    continue 'restart;
                }
            }

            let mut bestd: Option<usize> = None;
            let mut confused = self.cfg.strategy.parent_always;
            if !confused {
                for &ne in &nearer {
                    if beats(ne, bestd, k) {
                        bestd = Some(ne);
                    }
                }
                for &ne in &nearer {
                    if Some(ne) != bestd && beats(ne, bestd, k) {
                        confused = true;
                    }
                }
            }
            if confused {
                if self.cfg.strategy.parent_never && !self.cfg.strategy.parent_always {
                    return Err(failure("parent choice still ambiguous"));
                }
                self.counters.inc(Counter::HardParents);
                let Some(&first) = nearer.first() else {
                    return Err(failure("no nearer neighbour for a non-root cell"));
                };
                let mut best = first;
                for &ne in &nearer {
                    if ne != best && self.beats_exhaustive(Walker::new(c, ne), Walker::new(c, best))? {
                        best = ne;
                    }
                }
                bestd = Some(best);
            }
            let Some(bestd) = bestd else {
                return Err(failure("no nearer neighbour for a non-root cell"));
            };

            self.cell_mut(c).parent_dir = ParentDir::Edge(bestd);
            if let ParentDir::Edge(old) = self.cell(c).old_parent_dir {
                if old != bestd {
                    self.cell_mut(c).any_nearer = Some(old);
                    self.discover_shortcuts(c, d, c, bestd as i64, 0)?;
                }
            }
            self.parent_updates += 1;
            self.counters.inc(Counter::ParentUpdates);
            return Ok(Some(Walker::new(c, bestd)));
        }
    }

    /// Break a parent tie by stepping both candidates to their parents
    /// and comparing the relative rotation of each incoming edge against
    /// the next parent edge, recursively, until the chains differ.
    pub(crate) fn beats_exhaustive(&mut self, w1: Walker, w2: Walker) -> GenResult<bool> {
        let mut w1 = w1;
        let mut w2 = w2;
        loop {
            w1 = self.step(w1)?;
            w2 = self.step(w2)?;

            if self.cell(w1.cell).dist == Some(0) {
                return Ok(w1.spin > w2.spin);
            }
            self.be_solid(w1.cell)?;
            self.be_solid(w2.cell)?;
            self.check_solid_errors()?;

            let p1 = self.parent_walker(&mut w1)?;
            let p2 = self.parent_walker(&mut w2)?;
            let (Some(sw1), Some(sw2)) = (p1, p2) else {
                // a unification dropped one chain onto the root
                return Ok(w1.spin > w2.spin);
            };
            let d1 = gmod(sw1.spin as i64 - w1.spin as i64, self.valence(w1.cell));
            let d2 = gmod(sw2.spin as i64 - w2.spin as i64, self.valence(w2.cell));
            if d1 != d2 {
                return Ok(d1 < d2);
            }
            w1 = sw1;
            w2 = sw2;
        }
    }
}
