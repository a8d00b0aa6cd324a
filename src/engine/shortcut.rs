// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! The shortcut database.
//!
//! A *shortcut* is a learned equivalence of two edge-paths: starting from
//! any cell of a given shape, walking `pre` reaches the same face as
//! walking `post` (up to the recorded rotation), and the `post` route is
//! the one the tree prefers. Shortcuts are discovered whenever a solid
//! cell's distance has to be lowered: the descent chains under the old
//! and the new direction are walked until they intersect, and the two
//! path halves form the pair. Applying a shortcut to a cell walks both
//! paths and unifies their endpoints, which both removes duplicate cells
//! and propagates distance corrections globally.

use tracing::{debug, trace, warn};

use crate::error::{failure, GenResult};
use crate::graph::{gmod, CellId, Walker};
use crate::stats::Counter;

use super::Engine;

/// One learned path pair, attached to a shape id.
#[derive(Debug, Clone)]
pub(crate) struct Shortcut {
    /// Edge rotations of the old descent, origin-ward.
    pub pre: Vec<usize>,
    /// Edge rotations of the new descent, origin-ward.
    pub post: Vec<usize>,
    /// Rotation mapping the `pre` endpoint onto the `post` endpoint.
    pub delta: usize,
    /// The discovering cell's nearer-neighbour edge at discovery time;
    /// used to estimate whether an application can still shorten.
    pub last_dir: usize,
}

impl Engine {
    /// React to the distance of a solid cell dropping to `d`: record the
    /// error, and derive a shortcut from the old and new descent chains.
    ///
    /// `alt` is the cell whose frame the new direction `newdir` is given
    /// in, rotated by `delta` against `c` (both are `c` itself when the
    /// correction came from edge relaxation rather than unification).
    pub(crate) fn discover_shortcuts(
        &mut self,
        c: CellId,
        d: u32,
        alt: CellId,
        newdir: i64,
        delta: i64,
    ) -> GenResult<()> {
        self.solid_errors += 1;
        self.counters.inc(Counter::SolidErrors);
        self.check_timeout()?;
        if self.cfg.strategy.no_shortcuts || self.cfg.strategy.known_distances {
            return Ok(());
        }
        let c = self.canon_cell(c);
        let valence = self.valence(c);
        let newdir = gmod(newdir, valence);
        debug!(
            cell = c.index(),
            old = ?self.cell(c).dist,
            new = d,
            "solid distance lowered"
        );
        if Some(newdir) == self.cell(c).any_nearer {
            trace!("same direction, nothing to learn");
            return Ok(());
        }
        if self.cell(c).dist.is_none() {
            return Err(failure("solid error on a cell without a distance"));
        }

        // the descent chain under the old direction
        let mut seen: rustc_hash::FxHashMap<CellId, usize> = rustc_hash::FxHashMap::default();
        let mut walkers: Vec<Walker> = vec![Walker::new(c, 0)];
        let mut walkerdir: Vec<usize> = vec![0];
        seen.insert(c, 0);
        let mut j = 0;
        while j < walkers.len() {
            let w = walkers[j];
            j += 1;
            if self.cell(w.cell).dist == Some(0) {
                break;
            }
            let Some(an) = self.cell(w.cell).any_nearer else {
                continue;
            };
            for s in 0..self.valence(w.cell) {
                let w1 = self.rot(w, s as i64);
                if w1.spin != an {
                    continue;
                }
                let Some(p) = self.peek(w1) else { continue };
                if seen.contains_key(&p.cell) {
                    continue;
                }
                seen.insert(p.cell, walkers.len());
                walkers.push(p);
                walkerdir.push(s);
            }
        }

        // switch the cell over, then follow the new direction until the
        // chains intersect
        self.cell_mut(c).dist = Some(d);
        self.cell_mut(c).any_nearer = Some(newdir);
        self.fix_distances(c)?;

        let mut seen2: rustc_hash::FxHashSet<CellId> = rustc_hash::FxHashSet::default();
        let mut walkers2: Vec<Walker> = vec![self.cells.walker(alt, delta)];
        let mut walkerdir2: Vec<usize> = vec![0];
        let mut j = 0;
        while j < walkers2.len() {
            let w = self.canon(walkers2[j]);
            j += 1;
            if self.cell(w.cell).dist == Some(0) {
                break;
            }
            let Some(an) = self.cell(w.cell).any_nearer else {
                continue;
            };
            for s in 0..self.valence(w.cell) {
                let w1 = self.rot(w, s as i64);
                if w1.spin != an {
                    continue;
                }
                let Some(p) = self.peek(w1) else { continue };
                if seen2.contains(&p.cell) {
                    break;
                }
                seen2.insert(p.cell);
                walkers2.push(p);
                walkerdir2.push(s);
                if let Some(&wpos) = seen.get(&p.cell) {
                    return self.record_shortcut(c, &walkers, &walkers2, &walkerdir, &walkerdir2, wpos);
                }
            }
        }
        Ok(())
    }

    /// Dedup, store and immediately apply a freshly derived shortcut.
    fn record_shortcut(
        &mut self,
        c: CellId,
        walkers: &[Walker],
        walkers2: &[Walker],
        walkerdir: &[usize],
        walkerdir2: &[usize],
        wpos: usize,
    ) -> GenResult<()> {
        let pre: Vec<usize> = walkerdir[1..=wpos].to_vec();
        let post: Vec<usize> = walkerdir2[1..].to_vec();
        let sid = self.cell(c).shape;
        if self.shortcuts.get(&sid).map_or(false, |v| {
            v.iter().any(|s| s.pre == pre && s.post == post)
        }) {
            trace!(?pre, ?post, "shortcut already known");
            return Ok(());
        }
        let meet = walkers[wpos];
        let meet2 = walkers2[walkers2.len() - 1];
        let delta = gmod(meet2.spin as i64 - meet.spin as i64, self.valence(meet.cell));
        debug!(?pre, ?post, delta, shape = sid, "new shortcut");
        if pre.len() > 500 {
            return Err(failure("shortcut too long"));
        }
        let last_dir = self
            .cell(c)
            .any_nearer
            .ok_or_else(|| failure("shortcut recorded without a direction"))?;
        let sc = Shortcut {
            pre,
            post,
            delta,
            last_dir,
        };
        self.shortcuts.entry(sid).or_default().push(sc.clone());
        self.counters.inc(Counter::ShortcutsLearned);

        // search every existing cell of this shape for the same pattern
        let existing = self.cells.len() as u32;
        for i in 0..existing {
            let id = CellId(i);
            if self.cell(id).shape == sid {
                self.apply_shortcut(id, &sc)?;
            }
        }
        Ok(())
    }

    /// Apply every known shortcut of `c`'s shape to `c`.
    pub(crate) fn apply_shortcuts(&mut self, c: CellId) -> GenResult<()> {
        if self.cell(c).dist.map_or(true, |d| d == 0) {
            return Ok(());
        }
        let sid = self.cell(c).shape;
        let mut i = 0;
        // applications can learn further shortcuts; pick those up too
        while i < self.shortcuts.get(&sid).map_or(0, |v| v.len()) {
            let sc = self.shortcuts[&sid][i].clone();
            self.apply_shortcut(c, &sc)?;
            i += 1;
        }
        Ok(())
    }

    /// Walk one shortcut's paths from `c` and unify the endpoints.
    fn apply_shortcut(&mut self, c: CellId, sh: &Shortcut) -> GenResult<()> {
        if self.cell(c).dist.map_or(true, |d| d == 0) {
            return Ok(());
        }
        if !self.cfg.strategy.no_smart_shortcuts {
            self.apply_shortcut_smart(c, sh)
        } else {
            self.apply_shortcut_plain(c, sh)
        }
    }

    /// Lazy application: abort as soon as it is provable that nothing
    /// would be shortened, materialising as little as possible.
    fn apply_shortcut_smart(&mut self, c: CellId, sh: &Shortcut) -> GenResult<()> {
        let tw0 = self.canon(Walker::new(c, 0));
        let mut tw = tw0;
        for &v in &sh.pre {
            tw = self.rot(tw, v as i64);
            if self.peek(tw).is_none() && !self.cfg.strategy.less_smart_retrace {
                return Ok(());
            }
            tw = self.canon(tw);
            tw = self.step(tw)?;
            self.ensure_distance(tw.cell)?;
        }

        let mut more_steps = sh.post.len() as i64;
        let k = self.cycle_of(c);
        let cur_rank = self.cell(c).any_nearer.map_or(usize::MAX, |a| a % k);
        if sh.last_dir % k < cur_rank {
            more_steps -= 1;
        }

        tw = self.rot(tw, sh.delta as i64);
        for &v in sh.post.iter().rev() {
            tw = self.canon(tw);
            if self.peek(tw).is_none() && !self.cfg.strategy.less_smart_advance {
                let reach = self
                    .cell(tw.cell)
                    .dist
                    .map_or(i64::MAX, |d| d as i64 + more_steps);
                let own = self.cell(c).dist.map_or(i64::MAX, |d| d as i64);
                if reach > own {
                    return Ok(());
                }
            }
            tw = self.step(tw)?;
            self.ensure_distance(tw.cell)?;
            more_steps -= 1;
            tw = self.rot(tw, -(v as i64));
        }
        self.process_fix_queue()?;
        if self.cell(tw.cell).dist < self.cell(tw0.cell).dist {
            trace!(
                from = ?self.cell(tw0.cell).dist,
                to = ?self.cell(tw.cell).dist,
                "smart shortcut shortened"
            );
        }
        self.push_unify(tw, tw0)?;
        self.process_fix_queue()
    }

    /// Plain application: walk both paths to completion and unify.
    fn apply_shortcut_plain(&mut self, c: CellId, sh: &Shortcut) -> GenResult<()> {
        let mut tw = self.canon(Walker::new(c, 0));
        for &v in &sh.pre {
            tw = self.rot(tw, v as i64);
            let Some(p) = self.peek(tw) else {
                return Ok(());
            };
            let td = self.cell(tw.cell).dist;
            let pd = self.cell(p.cell).dist;
            match (td, pd) {
                (Some(a), Some(b)) if a > 0 && b == a - 1 => {}
                _ => return Ok(()),
            }
            tw = self.canon(tw);
            tw = self.step(tw)?;
        }

        let mut tw0 = self.canon(Walker::new(c, 0));
        let mut npath: Vec<CellId> = Vec::new();
        for &v in &sh.post {
            npath.push(tw0.cell);
            tw0 = self.rot(tw0, v as i64);
            tw0 = self.canon(tw0);
            tw0 = self.step(tw0)?;
            self.ensure_distance(tw0.cell)?;
        }
        npath.push(tw0.cell);

        let tw1 = self.rot(tw, sh.delta as i64);
        if self.cell(tw1.cell).shape != self.cell(tw0.cell).shape {
            warn!("shortcut endpoints have different shapes, not unifying");
        } else {
            self.push_unify(tw1, tw0)?;
        }
        self.process_fix_queue()?;
        for t in npath {
            let t = self.canon_cell(t);
            self.fix_distances(t)?;
        }
        Ok(())
    }
}
