// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Tessellation descriptions.
//!
//! A [`Tiling`] is a catalogue of polygonal shape prototypes together with
//! their edge-to-edge gluing. It is the read-only input of the rule
//! generator: the engine never needs coordinates, only the combinatorics.
//! That means which shape and edge lie across each edge, the rotational
//! symmetry of each shape, and how many faces meet at each vertex.
//!
//! Edges of a shape are numbered `0..valence` counterclockwise; vertex `v`
//! of a shape is the corner clockwise of edge `v`, so
//! `vertex_valence[v]` is the number of faces meeting at the corner to the
//! right of edge `v`.

use thiserror::Error;

/// The gluing of one edge: the shape and edge found across it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    /// Shape id of the neighbour.
    pub sid: usize,
    /// Edge index of the neighbour along the shared edge.
    pub eid: usize,
    /// True when the gluing reverses orientation.
    pub mirror: bool,
}

impl Connection {
    pub fn new(sid: usize, eid: usize) -> Self {
        Self {
            sid,
            eid,
            mirror: false,
        }
    }
}

/// One polygonal prototype of the tessellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    /// Per-edge gluing; the length of this vector is the shape's valence.
    pub connections: Vec<Connection>,
    /// Size of the rotational symmetry step of this shape within the
    /// tiling; divides the valence. A cell rotated by `cycle_length`
    /// occupies the same position in the pattern.
    pub cycle_length: usize,
    /// Number of faces meeting at each vertex.
    pub vertex_valence: Vec<usize>,
}

impl Shape {
    /// Number of edges (equivalently, vertices) of the shape.
    pub fn valence(&self) -> usize {
        self.connections.len()
    }
}

/// Problems detected while validating a tiling description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TilingError {
    #[error("tiling has no shapes")]
    Empty,
    #[error("shape {sid} edge {eid} points to missing shape {to_sid}")]
    DanglingShape { sid: usize, eid: usize, to_sid: usize },
    #[error("shape {sid} edge {eid} points to missing edge {to_eid} of shape {to_sid}")]
    DanglingEdge {
        sid: usize,
        eid: usize,
        to_sid: usize,
        to_eid: usize,
    },
    #[error("shape {sid} edge {eid} is not mirrored by its partner")]
    NotMutual { sid: usize, eid: usize },
    #[error("shape {sid}: cycle length {cycle} does not divide valence {valence}")]
    BadCycleLength {
        sid: usize,
        cycle: usize,
        valence: usize,
    },
    #[error("shape {sid}: {n} vertex valences for {valence} vertices")]
    BadVertexCount { sid: usize, n: usize, valence: usize },
    #[error("shape {sid} vertex {v}: valence {n} is too small")]
    BadVertexValence { sid: usize, v: usize, n: usize },
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// A validated catalogue of shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tiling {
    shapes: Vec<Shape>,
}

impl Tiling {
    /// Validate and wrap a shape catalogue.
    ///
    /// Checks that every connection is mutual (`a →_i b →_j a` with the
    /// same mirror flag), that each cycle length divides its valence, and
    /// that each shape carries one vertex valence (≥ 2) per vertex.
    pub fn new(shapes: Vec<Shape>) -> Result<Self, TilingError> {
        if shapes.is_empty() {
            return Err(TilingError::Empty);
        }
        for (sid, sh) in shapes.iter().enumerate() {
            let n = sh.valence();
            if sh.cycle_length == 0 || n % sh.cycle_length != 0 {
                return Err(TilingError::BadCycleLength {
                    sid,
                    cycle: sh.cycle_length,
                    valence: n,
                });
            }
            if sh.vertex_valence.len() != n {
                return Err(TilingError::BadVertexCount {
                    sid,
                    n: sh.vertex_valence.len(),
                    valence: n,
                });
            }
            for (v, &vv) in sh.vertex_valence.iter().enumerate() {
                if vv < 2 {
                    return Err(TilingError::BadVertexValence { sid, v, n: vv });
                }
            }
            for (eid, co) in sh.connections.iter().enumerate() {
                let other = shapes
                    .get(co.sid)
                    .ok_or(TilingError::DanglingShape {
                        sid,
                        eid,
                        to_sid: co.sid,
                    })?;
                let back = other.connections.get(co.eid).ok_or(TilingError::DanglingEdge {
                    sid,
                    eid,
                    to_sid: co.sid,
                    to_eid: co.eid,
                })?;
                if back.sid != sid || back.eid != eid || back.mirror != co.mirror {
                    return Err(TilingError::NotMutual { sid, eid });
                }
            }
        }
        Ok(Self { shapes })
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn shape(&self, sid: usize) -> &Shape {
        &self.shapes[sid]
    }

    /// True when any connection reverses orientation.
    pub fn has_mirrors(&self) -> bool {
        self.shapes
            .iter()
            .any(|sh| sh.connections.iter().any(|co| co.mirror))
    }

    /// The regular tiling with `valence`-gons, `vertex_valence` of them
    /// around every vertex.
    ///
    /// Every edge glues to the equally numbered edge of the neighbour:
    /// the half-turn about the shared edge midpoint is an
    /// orientation-preserving symmetry of the tiling, so the labelling is
    /// consistent. Under this labelling a walk around a closed vertex
    /// returns rotated by the vertex valence, so the cycle length is the
    /// largest symmetry step compatible with both numbers,
    /// `gcd(valence, vertex_valence)`.
    pub fn regular(valence: usize, vertex_valence: usize) -> Self {
        Self::regular_with_cycle(valence, vertex_valence, gcd(valence, vertex_valence))
    }

    /// Like [`Tiling::regular`], with an explicit rotational symmetry step.
    ///
    /// `cycle` must divide both the valence and the default cycle of
    /// [`Tiling::regular`]; a smaller cycle declares that a cell rotated
    /// by `cycle` edges is the same cell of the pattern, which the engine
    /// will exploit when unifying duplicates.
    pub fn regular_with_cycle(valence: usize, vertex_valence: usize, cycle: usize) -> Self {
        let shape = Shape {
            connections: (0..valence).map(|i| Connection::new(0, i)).collect(),
            cycle_length: cycle,
            vertex_valence: vec![vertex_valence; valence],
        };
        Self { shapes: vec![shape] }
    }

    /// A two-coloured regular tiling: shapes A and B alternate, so every
    /// edge of A glues to B and vice versa. Requires an even
    /// `vertex_valence` (an odd one cannot be two-coloured).
    pub fn alternating(valence: usize, vertex_valence: usize) -> Self {
        let cycle = gcd(valence, vertex_valence);
        let mk = |other: usize| Shape {
            connections: (0..valence).map(|i| Connection::new(other, i)).collect(),
            cycle_length: cycle,
            vertex_valence: vec![vertex_valence; valence],
        };
        Self {
            shapes: vec![mk(1), mk(0)],
        }
    }

    /// A striped square tiling with `stripes` distinct shapes: shape `i`
    /// continues into shape `i+1` eastward and into itself northward.
    ///
    /// Every stripe needs its own origin and states, which makes this
    /// family arbitrarily expensive, useful for exercising cell budgets.
    pub fn striped_squares(stripes: usize) -> Self {
        let shapes = (0..stripes)
            .map(|i| Shape {
                connections: vec![
                    Connection::new((i + 1) % stripes, 2),
                    Connection::new(i, 3),
                    Connection::new((i + stripes - 1) % stripes, 0),
                    Connection::new(i, 1),
                ],
                cycle_length: 4,
                vertex_valence: vec![4; 4],
            })
            .collect();
        Self { shapes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regular_is_valid() {
        for (p, q) in [(4, 4), (5, 4), (7, 3), (3, 7)] {
            let t = Tiling::regular(p, q);
            assert!(Tiling::new(t.shapes().to_vec()).is_ok(), "{{{p},{q}}}");
            assert_eq!(t.shape(0).valence(), p);
            assert_eq!(t.shape(0).vertex_valence[0], q);
        }
    }

    #[test]
    fn test_alternating_is_valid() {
        let t = Tiling::alternating(4, 4);
        assert!(Tiling::new(t.shapes().to_vec()).is_ok());
        assert_eq!(t.shapes().len(), 2);
        assert_eq!(t.shape(0).connections[2].sid, 1);
        assert_eq!(t.shape(1).connections[2].sid, 0);
    }

    #[test]
    fn test_striped_is_valid() {
        let t = Tiling::striped_squares(5);
        assert!(Tiling::new(t.shapes().to_vec()).is_ok());
        assert_eq!(t.shape(4).connections[0].sid, 0);
        assert_eq!(t.shape(0).connections[2].sid, 4);
    }

    #[test]
    fn test_rejects_non_mutual() {
        let mut shapes = Tiling::regular(4, 4).shapes().to_vec();
        shapes[0].connections[1] = Connection::new(0, 2);
        assert_eq!(
            Tiling::new(shapes),
            Err(TilingError::NotMutual { sid: 0, eid: 1 })
        );
    }

    #[test]
    fn test_rejects_bad_cycle() {
        let mut shapes = Tiling::regular(4, 4).shapes().to_vec();
        shapes[0].cycle_length = 3;
        assert!(matches!(
            Tiling::new(shapes),
            Err(TilingError::BadCycleLength { .. })
        ));
    }

    #[test]
    fn test_rejects_missing_vertex_valence() {
        let mut shapes = Tiling::regular(4, 4).shapes().to_vec();
        shapes[0].vertex_valence.pop();
        assert!(matches!(
            Tiling::new(shapes),
            Err(TilingError::BadVertexCount { .. })
        ));
    }
}
