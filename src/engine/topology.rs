// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Lazy growth and unification of the cell graph.
//!
//! Crossing an unconnected edge materialises the neighbour prescribed by
//! the shape catalogue (or by the external map in numerical mode). Every
//! new connection queues a vertex-closure check on both sides: walking
//! around the corner of the new edge may reveal that a ring of faces has
//! closed, which either connects two loose ends or proves that two cells
//! are names for the same face and must be unified.
//!
//! Connect, closure and unify calls are mutually reentrant; instead of
//! recursing they push [`FixOp`]s onto the engine's fix queue, which the
//! outermost mutator drains to a fixed point. At every observable point
//! the unified graph is consistent.

use tracing::trace;

use crate::error::{failure, GenResult};
use crate::graph::{CellId, Walker};
use crate::stats::Counter;

use super::Engine;

/// A deferred graph mutation.
#[derive(Debug, Clone, Copy)]
pub(crate) enum FixOp {
    /// Check the vertex ring to the right of the walker's edge.
    CheckRing(Walker),
    /// Unify two walkers naming the same face.
    Unify(Walker, Walker),
}

impl Engine {
    /// Cross the walker's edge, materialising the neighbour if necessary.
    ///
    /// The walker is canonicalised first, so the result is a walker on a
    /// live cell even when unification happened along the way.
    pub(crate) fn step(&mut self, w: Walker) -> GenResult<Walker> {
        self.counters.inc(Counter::Moves);
        let w = self.canon(w);
        self.ensure_neighbor(w)?;
        let w = self.canon(w);
        self.peek(w)
            .ok_or_else(|| failure("edge still unconnected after a step"))
    }

    /// Cell-level step: the neighbour across edge `i` of `c`.
    pub(crate) fn neighbor_cell(&mut self, c: CellId, i: usize) -> GenResult<CellId> {
        Ok(self.step(Walker::new(c, i))?.cell)
    }

    /// Step along an edge that must already exist.
    pub(crate) fn step_existing(&self, w: Walker) -> GenResult<Walker> {
        self.peek(w)
            .ok_or_else(|| failure("expected an existing connection"))
    }

    fn ensure_neighbor(&mut self, w: Walker) -> GenResult<()> {
        if self.peek(w).is_some() {
            return Ok(());
        }
        if self.external.is_some() {
            return self.external_step(w);
        }
        let co = self.tiling.shape(self.cell(w.cell).shape).connections[w.spin];
        let c1 = self.alloc_cell(co.sid);
        self.connect_and_close(w, Walker::new(c1, co.eid))
    }

    /// Numerical fallback: resolve the neighbour through the external map.
    fn external_step(&mut self, w: Walker) -> GenResult<()> {
        let Some(&h) = self.ext_of.get(&w.cell) else {
            return Err(failure("cell has no external handle"));
        };
        let Some(ext) = self.external.as_mut() else {
            return Err(failure("external step without an external map"));
        };
        let link = ext.neighbor(h, w.spin);
        let known_distances = self.cfg.strategy.known_distances;
        let c1 = match self.cell_of_ext.get(&link.cell) {
            Some(&c1) => c1,
            None => {
                let c1 = self.alloc_cell(link.shape);
                if known_distances {
                    let d = self
                        .external
                        .as_mut()
                        .and_then(|ext| ext.distance(link.cell));
                    self.cell_mut(c1).dist = d;
                }
                self.ext_of.insert(c1, link.cell);
                self.cell_of_ext.insert(link.cell, c1);
                c1
            }
        };
        self.cells.connect(w, Walker::new(c1, link.edge));
        if !known_distances {
            self.fix_distances(w.cell)?;
        }
        self.ensure_shorter(Walker::new(c1, 0))?;
        if self.cfg.strategy.numerical_fix {
            self.numerical_fix(w)?;
            let back = self.step_existing(w)?;
            self.numerical_fix(back)?;
        }
        Ok(())
    }

    /// In known-distances mode, materialise the neighbour across `cw`
    /// when the external map says it is strictly nearer.
    pub(crate) fn ensure_shorter(&mut self, cw: Walker) -> GenResult<()> {
        if !self.cfg.strategy.known_distances || self.external.is_none() {
            return Ok(());
        }
        let Some(&h) = self.ext_of.get(&cw.cell) else {
            return Ok(());
        };
        let Some(ext) = self.external.as_mut() else {
            return Ok(());
        };
        let link = ext.neighbor(h, cw.spin);
        let nd = ext.distance(link.cell);
        let cur = self.cell(cw.cell).dist;
        if let (Some(nd), Some(cur)) = (nd, cur) {
            if nd < cur {
                self.step(cw)?;
            }
        }
        Ok(())
    }

    /// Install the connection `p1 ↔ p2` and queue a vertex-closure check
    /// on both sides.
    pub(crate) fn connect_and_close(&mut self, p1: Walker, p2: Walker) -> GenResult<()> {
        let p1 = self.canon(p1);
        let p2 = self.canon(p2);
        self.cells.connect(p1, p2);
        self.fix_queue.push_back(FixOp::CheckRing(p1));
        self.fix_queue.push_back(FixOp::CheckRing(p2));
        self.process_fix_queue()
    }

    /// Queue the unification of two walkers naming the same face.
    pub(crate) fn push_unify(&mut self, a: Walker, b: Walker) -> GenResult<()> {
        if self.cell(a.cell).shape != self.cell(b.cell).shape {
            return Err(failure("queued a unification across shapes"));
        }
        self.fix_queue.push_back(FixOp::Unify(a, b));
        Ok(())
    }

    /// Drain the fix queue to a fixed point. Reentrant calls return
    /// immediately; the outermost caller does all the work.
    pub(crate) fn process_fix_queue(&mut self) -> GenResult<()> {
        if self.in_fixing {
            return Ok(());
        }
        self.in_fixing = true;
        let r = self.drain_fix_queue();
        self.in_fixing = false;
        r
    }

    fn drain_fix_queue(&mut self) -> GenResult<()> {
        while let Some(op) = self.fix_queue.pop_front() {
            match op {
                FixOp::CheckRing(w) => self.check_vertex_ring(w)?,
                FixOp::Unify(a, b) => self.unify(a, b)?,
            }
        }
        Ok(())
    }

    /// Check whether the vertex to the right of `pw`'s edge has closed.
    ///
    /// Steps alternately backward (`cross, −1`) and forward (`+1, cross`)
    /// around the vertex. Returning to the start after exactly
    /// `vertex_valence` steps means the ring was already closed. Meeting a
    /// different walker after `vertex_valence` steps exhibits two names
    /// for one face: queue their unification. Ending one step short with
    /// both ends loose means the ring closes right here: connect them.
    fn check_vertex_ring(&mut self, pw: Walker) -> GenResult<()> {
        let pw = self.canon(pw);
        let valence = self.tiling.shape(self.cell(pw.cell).shape).vertex_valence[pw.spin];
        let mut steps = 0;
        let mut pwf = pw;
        let mut pwb = pw;
        loop {
            let Some(n) = self.peek(pwb) else { break };
            pwb = self.canon(n);
            pwb = self.rot(pwb, -1);
            steps += 1;
            if pwb == pwf {
                if steps == valence {
                    return Ok(());
                }
                return Err(failure("vertex ring closed too early"));
            }
            if steps == valence {
                return self.push_unify(pwf, pwb);
            }
        }
        loop {
            pwf = self.rot(pwf, 1);
            let Some(n) = self.peek(pwf) else { break };
            pwf = self.canon(n);
            steps += 1;
            if pwb == pwf {
                if steps == valence {
                    return Ok(());
                }
                return Err(failure("vertex ring closed too early"));
            }
            if steps == valence {
                return self.push_unify(pwf, pwb);
            }
        }
        if steps == valence - 1 {
            self.connect_and_close(pwb, pwf)?;
            self.fix_distances(pwb.cell)?;
        }
        Ok(())
    }

    /// Vertex closure for numerical mode, where the ring is already known
    /// to be consistent: only the final loose-end connection is made, and
    /// any mismatch is a hard failure.
    fn numerical_fix(&mut self, pw: Walker) -> GenResult<()> {
        let valence = self.tiling.shape(self.cell(pw.cell).shape).vertex_valence[pw.spin];
        let mut steps = 0;
        let mut pwf = pw;
        let mut pwb = pw;
        loop {
            let Some(n) = self.peek(pwb) else { break };
            pwb = self.rot(n, -1);
            steps += 1;
            if pwb == pwf {
                if steps == valence {
                    return Ok(());
                }
                return Err(failure("vertex ring closed too early"));
            }
            if steps == valence {
                return Err(failure("vertex ring does not close"));
            }
        }
        loop {
            pwf = self.rot(pwf, 1);
            let Some(n) = self.peek(pwf) else { break };
            pwf = n;
            steps += 1;
            if pwb == pwf {
                if steps == valence {
                    return Ok(());
                }
                return Err(failure("vertex ring closed too early"));
            }
            if steps == valence {
                return Err(failure("vertex ring does not close"));
            }
        }
        if steps == valence - 1 {
            self.cells.connect(pwb, pwf);
            self.fix_distances(pwb.cell)?;
        }
        Ok(())
    }

    /// Merge two walkers that name the same face.
    ///
    /// The spins must agree modulo the shape's cycle length. Distances are
    /// reconciled first; then every corresponding edge pair is connected
    /// or recursively queued for unification, and the absorbed cell is
    /// linked to its canonical representative with the rotation between
    /// the two frames.
    fn unify(&mut self, pw1: Walker, pw2: Walker) -> GenResult<()> {
        let mut pw1 = self.canon(pw1);
        let mut pw2 = self.canon(pw2);
        if pw1 == pw2 {
            return Ok(());
        }
        if pw1.cell == pw2.cell {
            if pw1.spin != pw2.spin {
                return Err(failure("unifying a cell with itself at a different rotation"));
            }
            return Ok(());
        }
        if self.cell(pw1.cell).shape != self.cell(pw2.cell).shape {
            return Err(failure("unifying two cells of different shapes"));
        }
        let cycle = self.cycle_of(pw1.cell);
        if (pw1.spin as i64 - pw2.spin as i64).rem_euclid(cycle as i64) != 0 {
            return Err(failure("unification spin disagrees with the cycle length"));
        }
        trace!(a = pw1.cell.index(), b = pw2.cell.index(), "unifying cells");

        self.merge_distances(pw1.cell, pw2.cell, pw2.spin as i64 - pw1.spin as i64)?;

        let n = self.valence(pw1.cell);
        for _ in 0..n {
            match (self.peek(pw1), self.peek(pw2)) {
                (_, None) => {
                    // nothing to reconnect on this edge
                }
                (None, Some(nb2)) => {
                    self.connect_and_close(pw1, nb2)?;
                }
                (Some(nb1), Some(nb2)) => {
                    self.push_unify(nb1, nb2)?;
                    self.connect_and_close(pw1, nb2)?;
                    self.connect_and_close(pw1, nb1)?;
                }
            }
            pw1 = self.rot(pw1, 1);
            pw2 = self.rot(pw2, 1);
        }
        let link = self.rot(pw1, -(pw2.spin as i64));
        self.cell_mut(pw2.cell).unified_to = link;
        self.counters.inc(Counter::CellsUnified);
        self.fix_distances(pw1.cell)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::engine::Engine;
    use crate::graph::Walker;
    use crate::tiling::Tiling;

    /// Stepping around a square-grid vertex must close the ring onto the
    /// starting cell after four faces.
    #[test]
    fn test_vertex_ring_closes() {
        let mut e = Engine::new(Tiling::regular(4, 4), Config::default());
        let origin = e.alloc_cell(0);
        e.cell_mut(origin).dist = Some(0);
        e.origins.push(Walker::new(origin, 0));

        // cross edges 0 and 1, then reach the diagonal cell from both
        // sides of the corner between them; ring closure must yield one
        // cell, not two
        let mut w = Walker::new(origin, 0);
        w = e.step(w).unwrap();
        let mut v = Walker::new(origin, 1);
        v = e.step(v).unwrap();
        let d1 = e.step(e.rot(w, -1)).unwrap();
        let d2 = e.step(e.rot(v, 1)).unwrap();
        let d1 = e.canon(d1);
        let d2 = e.canon(d2);
        assert_eq!(d1.cell, d2.cell, "one diagonal cell from both routes");
        e.verify_graph().unwrap();
    }

    /// Walking straight out and around a 2×2 block must come back to the
    /// same cells without ever duplicating them.
    #[test]
    fn test_square_block_is_consistent() {
        let mut e = Engine::new(Tiling::regular(4, 4), Config::default());
        let origin = e.alloc_cell(0);
        e.cell_mut(origin).dist = Some(0);
        e.origins.push(Walker::new(origin, 0));

        let mut w = Walker::new(origin, 0);
        for _ in 0..4 {
            w = e.step(w).unwrap();
            w = e.rot(w, 2); // face forward again
            w = e.rot(w, 1); // turn left
        }
        let w = e.canon(w);
        assert_eq!(e.canon_cell(origin), w.cell);
    }
}
