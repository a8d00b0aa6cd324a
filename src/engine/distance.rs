// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Distance maintenance.
//!
//! A cell's distance from the origin is computed lazily by relaxing
//! `dist(x) = 1 + min over neighbours` across the materialised frontier.
//! [`Engine::be_solid`] freezes a distance: once a cell is solid, having
//! to lower its distance later is a *solid error*. The shortcut database
//! is then fed from the old and new descent paths (see the shortcut
//! module) and the current iteration is abandoned with a retry as soon as
//! [`Engine::check_solid_errors`] runs.
//!
//! Under the `bfs` strategy flag distances are instead assigned by a
//! global breadth-first queue that materialises cells ring by ring.

use crate::error::{failure, surrender, GenResult};
use crate::graph::{CellId, ParentDir, Walker};

use super::Engine;

impl Engine {
    /// Compute the distance of `c` if it is still unknown.
    pub(crate) fn ensure_distance(&mut self, c: CellId) -> GenResult<()> {
        if self.cell(c).dist.is_some() {
            return Ok(());
        }
        self.fix_distances(c)
    }

    /// Relax distances outward from `c`, repairing every reachable cell
    /// whose distance is too large.
    pub(crate) fn fix_distances(&mut self, c: CellId) -> GenResult<()> {
        self.check_timeout()?;
        if self.cfg.strategy.bfs {
            return self.fix_distances_bfs(c);
        }
        let c = self.canon_cell(c);
        self.cell_mut(c).distance_fixed = true;
        if self.cfg.strategy.known_distances {
            return Ok(());
        }

        let mut q = vec![c];
        let mut qi = 0;
        while qi < q.len() {
            let mut c = q[qi];
            qi += 1;
            'restart: loop {
                let valence = self.valence(c);
                for i in 0..valence {
                    c = self.canon_cell(c);
                    let Some(e) = self.cell(c).nbr[i] else { continue };
                    let ci = Walker::new(c, i);
                    let ci1 = Walker::new(e.cell, e.spin);
                    if self.relax_edge(ci, ci1)? {
                        continue 'restart;
                    }
                    if self.relax_edge(ci1, ci)? {
                        q.push(ci1.cell);
                    }
                }
                break;
            }
        }
        Ok(())
    }

    /// Try to lower `tgt`'s distance through the edge from `src`.
    ///
    /// Returns true when the distance was lowered. Lowering a solid cell
    /// feeds the shortcut database first; afterwards the cell's parent
    /// direction, code and the side cache are invalidated.
    fn relax_edge(&mut self, tgtw: Walker, srcw: Walker) -> GenResult<bool> {
        let Some(sd) = self.cell(srcw.cell).dist else {
            return Ok(false);
        };
        let new_d = sd + 1;
        let lower = match self.cell(tgtw.cell).dist {
            None => true,
            Some(d) => d > new_d,
        };
        if !lower {
            return Ok(false);
        }
        if self.cell(tgtw.cell).is_solid {
            self.discover_shortcuts(tgtw.cell, new_d, tgtw.cell, tgtw.spin as i64, 0)?;
        }
        let tgtw = self.canon(tgtw);
        self.cell_mut(tgtw.cell).dist = Some(new_d);
        self.sidecache.clear();
        self.cell_mut(tgtw.cell).any_nearer = Some(tgtw.spin);
        self.remove_parentdir(tgtw.cell);
        Ok(true)
    }

    /// Global-queue distance mode: pop cells in breadth-first order,
    /// materialising and labelling their neighbours, until `c` has a
    /// distance.
    fn fix_distances_bfs(&mut self, c: CellId) -> GenResult<()> {
        loop {
            if self.in_fixing {
                return Ok(());
            }
            let c = self.canon_cell(c);
            if self.cell(c).dist.is_some() {
                return Ok(());
            }
            if self.cells.len() >= self.cfg.max_tcellcount {
                return Err(surrender("max_tcellcount exceeded"));
            }
            let Some(c1) = self.bfs_queue.pop_front() else {
                return Err(failure("breadth-first queue ran dry"));
            };
            let c1 = self.canon_cell(c1);
            let d1 = self
                .cell(c1)
                .dist
                .ok_or_else(|| failure("queued cell without a distance"))?;
            for i in 0..self.valence(c1) {
                let c2 = self.neighbor_cell(c1, i)?;
                if self.cell(c2).dist.is_none() {
                    self.cell_mut(c2).dist = Some(d1 + 1);
                    self.bfs_queue.push_back(c2);
                }
            }
        }
    }

    /// Forget the parent direction and code of `c` and its neighbours,
    /// remembering the previous choice for change detection.
    pub(crate) fn remove_parentdir(&mut self, c: CellId) {
        self.sidecache.clear();
        let mut wipe = |e: &mut Engine, id: CellId| {
            let pd = e.cell(id).parent_dir;
            if matches!(pd, ParentDir::Edge(_)) {
                e.cell_mut(id).old_parent_dir = pd;
            }
            e.cell_mut(id).parent_dir = ParentDir::Unknown;
            e.cell_mut(id).code = None;
        };
        wipe(self, c);
        for i in 0..self.valence(c) {
            if let Some(e) = self.cell(c).nbr[i] {
                wipe(self, e.cell);
            }
        }
    }

    /// Reconcile the distances of two cells about to be unified;
    /// `delta` is the rotation from `c1`'s frame into `c2`'s.
    pub(crate) fn merge_distances(&mut self, c1: CellId, c2: CellId, delta: i64) -> GenResult<()> {
        let d1 = self.cell(c1).dist;
        let d2 = self.cell(c2).dist;
        let d = match (d1, d2) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        if self.cell(c1).is_solid && d != d1 {
            self.solid_errors += 1;
            if let (Some(d), Some(an2)) = (d, self.cell(c2).any_nearer) {
                self.discover_shortcuts(c1, d, c2, an2 as i64 - delta, delta)?;
            }
            self.remove_parentdir(c1);
        }
        if d != d1 {
            self.fix_distances(c1)?;
        }
        self.cell_mut(c1).dist = d;
        if self.cell(c2).is_solid && d != d2 {
            self.solid_errors += 1;
            if let (Some(d), Some(an1)) = (d, self.cell(c1).any_nearer) {
                self.discover_shortcuts(c2, d, c1, an1 as i64 + delta, -delta)?;
            }
            self.remove_parentdir(c2);
        }
        if d != d2 {
            self.fix_distances(c2)?;
        }
        self.cell_mut(c2).dist = d;
        let fixed = self.cell(c1).distance_fixed || self.cell(c2).distance_fixed;
        let solid = self.cell(c1).is_solid || self.cell(c2).is_solid;
        self.cell_mut(c1).distance_fixed = fixed;
        self.cell_mut(c2).distance_fixed = fixed;
        self.cell_mut(c1).is_solid = solid;
        self.cell_mut(c2).is_solid = solid;
        Ok(())
    }

    /// Raise a retry if any solid error occurred since the last check.
    pub(crate) fn check_solid_errors(&mut self) -> GenResult<()> {
        let pending = self.solid_errors > 0;
        self.solid_errors = 0;
        if pending {
            self.sidecache.clear();
            if self.cfg.strategy.always_clean {
                self.clean_analysis();
            }
            return Err(crate::error::retry("solid error"));
        }
        Ok(())
    }

    /// Fix and freeze the distance of `c`: compute it, run the shortcut
    /// database against the cell, mark it solid, and recursively solidify
    /// the certified nearer neighbour.
    pub(crate) fn be_solid(&mut self, c: CellId) -> GenResult<()> {
        if self.cell(c).is_solid {
            return Ok(());
        }
        if self.cells.len() >= self.cfg.max_tcellcount {
            return Err(surrender("max_tcellcount exceeded"));
        }
        let mut c = self.canon_cell(c);
        self.ensure_distance(c)?;
        c = self.canon_cell(c);
        self.apply_shortcuts(c)?;
        c = self.canon_cell(c);
        if self.cell(c).dist.is_none() {
            return Err(failure("cell made solid without a distance"));
        }
        self.cell_mut(c).is_solid = true;
        let cell = self.cell(c);
        if cell.dist > Some(0) && !self.cfg.strategy.near_solid {
            if let Some(an) = cell.any_nearer {
                if let Some(e) = self.cell(c).nbr[an] {
                    self.be_solid(e.cell)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::engine::Engine;
    use crate::graph::Walker;
    use crate::tiling::Tiling;

    /// Walking two steps away from the origin must yield distance 2, and
    /// the certified nearer neighbour must really be nearer.
    #[test]
    fn test_distances_grow_along_a_ray() {
        let mut e = Engine::new(Tiling::regular(4, 4), Config::default());
        let origin = e.alloc_cell(0);
        e.cell_mut(origin).dist = Some(0);
        e.origins.push(Walker::new(origin, 0));

        let mut w = Walker::new(origin, 0);
        w = e.step(w).unwrap();
        e.be_solid(w.cell).unwrap();
        assert_eq!(e.cell(w.cell).dist, Some(1));

        let mut v = e.rot(w, 2); // keep going straight
        v = e.step(v).unwrap();
        e.be_solid(v.cell).unwrap();
        assert_eq!(e.cell(v.cell).dist, Some(2));
        assert!(e.cell(v.cell).is_solid);
        e.verify_graph().unwrap();
    }

    /// The diagonal cell of the square grid has two equally near
    /// neighbours; its distance must still come out as 2.
    #[test]
    fn test_diagonal_distance() {
        let mut e = Engine::new(Tiling::regular(4, 4), Config::default());
        let origin = e.alloc_cell(0);
        e.cell_mut(origin).dist = Some(0);
        e.origins.push(Walker::new(origin, 0));

        let mut w = Walker::new(origin, 0);
        w = e.step(w).unwrap();
        e.be_solid(w.cell).unwrap();
        let d = e.step(e.rot(w, -1)).unwrap();
        e.be_solid(d.cell).unwrap();
        let dc = e.canon(d).cell;
        assert_eq!(e.cell(dc).dist, Some(2));
    }
}
