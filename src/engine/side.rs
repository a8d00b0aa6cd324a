// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! The side oracle.
//!
//! [`Engine::get_side`] decides whether the cell across a walker's edge
//! lies to the left (negative), to the right (positive), or level with it
//! (zero) in the inferred tree. The fast path walks both endpoints up
//! their parent chains to the common ancestor and compares the rotational
//! offsets of the two incoming edges against the ancestor's parent edge.
//! Near the root, and whenever the ancestor sits in the single-live-branch
//! set where those offsets are not meaningful, the slow path rotates
//! around the tree with [`Engine::treewalk`] steps in both directions and
//! reports which direction arrives first.
//!
//! Results are cached; the cache is cleared whenever any distance drops.

use crate::error::{failure, retry, GenResult};
use crate::graph::{gmod, Walker};

use super::Engine;

impl Engine {
    /// One step of the tree-order walk: move up to the parent when the
    /// walker sits on its cell's parent edge, move down when the
    /// neighbour's parent edge points back, stay otherwise; then rotate
    /// by `delta`.
    pub(crate) fn treewalk(&mut self, cw: &mut Walker, delta: i64) -> GenResult<()> {
        let cwd = self.parent_walker(cw)?;
        if cwd == Some(*cw) {
            *cw = self.step(*cw)?;
        } else {
            let mut cw1 = self.step(*cw)?;
            let cwd1 = self.parent_walker(&mut cw1)?;
            if cwd1 == Some(cw1) {
                *cw = cw1;
            }
        }
        *cw = self.rot(*cw, delta);
        Ok(())
    }

    /// Which side of the tree the cell across `what`'s edge lies on:
    /// negative for left, positive for right, zero for level.
    pub(crate) fn get_side(&mut self, what: Walker) -> GenResult<i32> {
        let cache = !self.cfg.strategy.no_sidecache;
        let fast = !self.cfg.strategy.slow_side;

        if cache {
            if let Some(&v) = self.sidecache.get(&what) {
                return Ok(v);
            }
        }

        let mut res: Option<i32> = None;
        let mut steps: u32 = 0;

        if fast {
            let mut w = what;
            let mut tw = self.step(what)?;
            while w.cell != tw.cell {
                steps += 1;
                if steps > self.cfg.max_getside {
                    return Err(failure("ancestor walk did not converge"));
                }
                w = self.canon(w);
                tw = self.canon(tw);
                let dw = self.dist_req(w.cell)?;
                let dtw = self.dist_req(tw.cell)?;
                if dw > dtw {
                    self.side_adv(&mut w)?;
                } else if dw < dtw {
                    self.side_adv(&mut tw)?;
                } else {
                    self.side_adv(&mut w)?;
                    self.side_adv(&mut tw)?;
                }
            }
            if self.cell(w.cell).dist != Some(0)
                && !self.single_live_branch_near_root.contains(&w.cell)
            {
                let Some(wd) = self.parent_walker(&mut w)? else {
                    return Err(failure("non-root cell without a parent edge"));
                };
                tw = self.canon(tw);
                let n = self.valence(w.cell);
                let a = gmod(w.spin as i64 - wd.spin as i64, n) as i32;
                let b = gmod(tw.spin as i64 - wd.spin as i64, n) as i32;
                res = Some(a - b);
            }
        }

        // walk around the tree; also catches the ends-level case the fast
        // path cannot see
        let mut wl = what;
        let mut wr = what;
        let to_what = self.step(what)?;
        let mut ws = what;
        self.treewalk(&mut ws, 0)?;
        if ws == to_what {
            res = Some(0);
        }

        while res.is_none() {
            self.check_solid_errors()?;
            steps += 1;
            if steps > self.cfg.max_getside {
                if self.parent_updates > 0 {
                    return Err(retry("side walk did not converge"));
                }
                return Err(failure("side walk did not converge"));
            }
            let dl = self.dist_req(wl.cell)?;
            let dr = self.dist_req(wr.cell)?;
            if dl <= dr {
                self.treewalk(&mut wl, -1)?;
                if wl == to_what {
                    res = Some(1);
                }
            }
            if dl >= dr {
                self.treewalk(&mut wr, 1)?;
                if wr == to_what {
                    res = Some(-1);
                }
            }
        }

        let res = res.ok_or_else(|| failure("side undecided"))?;
        if cache {
            self.sidecache.insert(what, res);
        }
        Ok(res)
    }

    /// Advance one walker of the ancestor merge up its parent chain.
    fn side_adv(&mut self, cw: &mut Walker) -> GenResult<()> {
        let Some(p) = self.parent_walker(cw)? else {
            return Err(failure("ancestor walk stepped past the root"));
        };
        let pk = self.step(p)?;
        let pd = self.dist_req(pk.cell)?;
        let wd = self.dist_req(p.cell)?;
        if pd >= wd {
            self.check_solid_errors()?;
            return Err(failure("parent edge does not descend"));
        }
        *cw = pk;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::engine::Engine;
    use crate::graph::Walker;
    use crate::tiling::Tiling;

    /// `get_side(w)` and `get_side(w + wstep)` must disagree in sign for
    /// any edge whose endpoints both have positive distance.
    #[test]
    fn test_side_antisymmetry() {
        let mut e = Engine::new(Tiling::regular(4, 4), Config::default());
        e.generate().unwrap();

        let mut checked = 0;
        for id in 0..e.cell_count() as u32 {
            let id = crate::graph::CellId(id);
            if !e.cells.is_canonical(id) {
                continue;
            }
            if e.cell(id).dist.map_or(true, |d| d == 0 || d > 3) {
                continue;
            }
            for i in 0..e.valence(id) {
                let w = Walker::new(id, i);
                let Some(m) = e.peek(w) else { continue };
                if e.cell(m.cell).dist.map_or(true, |d| d == 0) {
                    continue;
                }
                let (Ok(a), Ok(b)) = (e.get_side(w), e.get_side(m)) else {
                    continue;
                };
                assert_eq!(
                    a.signum(),
                    -b.signum(),
                    "sides of one edge must mirror each other"
                );
                checked += 1;
            }
            if checked > 20 {
                break;
            }
        }
        assert!(checked > 0, "no edge was checked");
    }
}
