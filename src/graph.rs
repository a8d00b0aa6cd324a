// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! The unified cell graph: a flat arena of cells with union-find identity.
//!
//! Cells are stored in a `Vec` and addressed by [`CellId`]; a [`Walker`] is
//! an oriented incidence `(cell, spin)` naming one edge of one cell. Two
//! cells discovered to be the same face are *unified*: the absorbed cell
//! keeps a `unified_to` link carrying both the canonical cell and the edge
//! rotation between the two frames, so every walker into the absorbed cell
//! can be redirected. `unified_to` is an index plus a rotation, never an
//! owning reference, which keeps the cyclic canonical-representative
//! relation trivially safe.
//!
//! This module owns only identity and adjacency. Everything that needs the
//! tiling description or distance bookkeeping (creating neighbours,
//! closing vertices, unifying) lives on the engine.

use smallvec::SmallVec;

/// Index of a cell in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(pub(crate) u32);

impl CellId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// An oriented incidence of a cell and one of its edges.
///
/// The spin is always normalized into `0..valence`. Walkers compare by
/// (cell, spin); callers canonicalise through the union-find before
/// comparing walkers for identity of the underlying face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Walker {
    pub cell: CellId,
    pub spin: usize,
}

impl Walker {
    pub(crate) fn new(cell: CellId, spin: usize) -> Self {
        Self { cell, spin }
    }
}

/// One directed half of an edge connection: the neighbour cell and the
/// edge index at which the neighbour sees us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EdgeTo {
    pub cell: CellId,
    pub spin: usize,
}

/// Canonical parent-edge choice of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParentDir {
    /// Not yet resolved.
    Unknown,
    /// The cell is at distance zero and has no parent.
    Root,
    /// Edge index of the canonical parent.
    Edge(usize),
}

/// One face of the (partially materialised) tessellation.
#[derive(Debug, Clone)]
pub(crate) struct Cell {
    /// Shape id in the tiling catalogue.
    pub shape: usize,
    /// Number of edges; cached from the shape.
    pub valence: usize,
    /// Distance from the origin, once known.
    pub dist: Option<u32>,
    /// Cached state id of the parent-oriented code.
    pub code: Option<usize>,
    pub parent_dir: ParentDir,
    /// Previous parent choice, for change detection.
    pub old_parent_dir: ParentDir,
    /// Edge towards some strictly nearer neighbour; the distance
    /// certificate.
    pub any_nearer: Option<usize>,
    /// The distance is believed final; lowering it afterwards is a solid
    /// error.
    pub is_solid: bool,
    pub distance_fixed: bool,
    /// Union-find link: canonical cell plus the rotation from this cell's
    /// frame into the canonical frame. Self-link when canonical.
    pub unified_to: Walker,
    /// Adjacency: for each edge, the neighbour and its incoming edge.
    pub nbr: SmallVec<[Option<EdgeTo>; 8]>,
}

/// The cell arena.
#[derive(Debug, Default)]
pub(crate) struct CellStore {
    cells: Vec<Cell>,
}

/// `x mod m`, always in `0..m`.
pub(crate) fn gmod(x: i64, m: usize) -> usize {
    x.rem_euclid(m as i64) as usize
}

impl CellStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn alloc(&mut self, shape: usize, valence: usize) -> CellId {
        let id = CellId(self.cells.len() as u32);
        self.cells.push(Cell {
            shape,
            valence,
            dist: None,
            code: None,
            parent_dir: ParentDir::Unknown,
            old_parent_dir: ParentDir::Unknown,
            any_nearer: None,
            is_solid: false,
            distance_fixed: false,
            unified_to: Walker::new(id, 0),
            nbr: SmallVec::from_elem(None, valence),
        });
        id
    }

    pub fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id.index()]
    }

    pub fn cell_mut(&mut self, id: CellId) -> &mut Cell {
        &mut self.cells[id.index()]
    }

    /// Rotate a walker by `delta` edges.
    pub fn rot(&self, w: Walker, delta: i64) -> Walker {
        let n = self.cell(w.cell).valence;
        Walker::new(w.cell, gmod(w.spin as i64 + delta, n))
    }

    /// Construct a walker with a possibly out-of-range spin.
    pub fn walker(&self, cell: CellId, spin: i64) -> Walker {
        let n = self.cell(cell).valence;
        Walker::new(cell, gmod(spin, n))
    }

    /// The walker across `w`'s edge, if that edge is connected.
    pub fn peek(&self, w: Walker) -> Option<Walker> {
        self.cell(w.cell).nbr[w.spin].map(|e| Walker::new(e.cell, e.spin))
    }

    /// Install the mutual connection `a ↔ b`.
    pub fn connect(&mut self, a: Walker, b: Walker) {
        self.cell_mut(a.cell).nbr[a.spin] = Some(EdgeTo {
            cell: b.cell,
            spin: b.spin,
        });
        self.cell_mut(b.cell).nbr[b.spin] = Some(EdgeTo {
            cell: a.cell,
            spin: a.spin,
        });
    }

    /// Canonicalise a walker through the union-find, compressing paths.
    pub fn canon(&mut self, w: Walker) -> Walker {
        let u = self.cell(w.cell).unified_to;
        if u.cell == w.cell {
            return w;
        }
        let root = self.canon(u);
        self.cell_mut(w.cell).unified_to = root;
        self.rot(root, w.spin as i64)
    }

    /// Canonicalise a bare cell id.
    pub fn canon_cell(&mut self, c: CellId) -> CellId {
        self.canon(Walker::new(c, 0)).cell
    }

    pub fn is_canonical(&self, c: CellId) -> bool {
        self.cell(c).unified_to.cell == c
    }

    /// Drop every cell.
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn ids(&self) -> impl Iterator<Item = CellId> {
        (0..self.cells.len() as u32).map(CellId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(n: usize, valence: usize) -> (CellStore, Vec<CellId>) {
        let mut s = CellStore::new();
        let ids = (0..n).map(|_| s.alloc(0, valence)).collect();
        (s, ids)
    }

    #[test]
    fn test_alloc_initialises_self_unified() {
        let (s, ids) = store_with(2, 5);
        assert_eq!(s.len(), 2);
        for id in ids {
            assert!(s.is_canonical(id));
            assert_eq!(s.cell(id).valence, 5);
            assert!(s.cell(id).dist.is_none());
            assert!(s.cell(id).nbr.iter().all(|e| e.is_none()));
        }
    }

    #[test]
    fn test_rot_wraps() {
        let (s, ids) = store_with(1, 7);
        let w = Walker::new(ids[0], 2);
        assert_eq!(s.rot(w, 3).spin, 5);
        assert_eq!(s.rot(w, 7).spin, 2);
        assert_eq!(s.rot(w, -3).spin, 6);
        assert_eq!(s.walker(ids[0], -1).spin, 6);
    }

    #[test]
    fn test_connect_is_mutual() {
        let (mut s, ids) = store_with(2, 4);
        let a = Walker::new(ids[0], 1);
        let b = Walker::new(ids[1], 3);
        s.connect(a, b);
        assert_eq!(s.peek(a), Some(b));
        assert_eq!(s.peek(b), Some(a));
        assert_eq!(s.peek(Walker::new(ids[0], 0)), None);
    }

    #[test]
    fn test_canon_composes_rotations() {
        let (mut s, ids) = store_with(3, 6);
        // ids[2] absorbed into ids[1] with rotation 2, ids[1] into ids[0]
        // with rotation 1.
        s.cell_mut(ids[2]).unified_to = Walker::new(ids[1], 2);
        s.cell_mut(ids[1]).unified_to = Walker::new(ids[0], 1);
        let w = s.canon(Walker::new(ids[2], 4));
        assert_eq!(w.cell, ids[0]);
        // spin 4 in frame of ids[2] = 4 + 2 in frame of ids[1]
        //                           = 4 + 2 + 1 (mod 6) in frame of ids[0].
        assert_eq!(w.spin, 1);
        // path compression points ids[2] directly at ids[0] now
        assert_eq!(s.cell(ids[2]).unified_to, Walker::new(ids[0], 3));
        assert!(s.is_canonical(ids[0]));
    }

    #[test]
    fn test_canon_cell() {
        let (mut s, ids) = store_with(2, 4);
        s.cell_mut(ids[1]).unified_to = Walker::new(ids[0], 3);
        assert_eq!(s.canon_cell(ids[1]), ids[0]);
        assert_eq!(s.canon_cell(ids[0]), ids[0]);
    }
}
