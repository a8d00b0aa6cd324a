// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! External-map interface for the numerical fallback mode.
//!
//! Normally the engine materialises cells from the shape catalogue alone.
//! In the numerical fallback mode a pre-existing map object answers
//! neighbour queries instead: the engine keeps a handle for every cell it
//! has materialised and asks the map which handle, edge and shape lie
//! across a given edge. Any frame adjustment the external structure needs
//! (for example, re-indexing edges of a rule-based map by its own parent
//! directions) is the implementor's business; the engine always speaks in
//! plain edge indices of the reported shape.
//!
//! When the map also knows distances from its own origin, the
//! `known_distances` strategy flag makes the engine trust
//! [`ExternalMap::distance`] instead of computing distances itself.

/// Opaque handle for a cell of the external map.
pub type ExternalHandle = u64;

/// An origin cell reported by the external map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalSeed {
    pub cell: ExternalHandle,
    pub shape: usize,
}

/// The answer to a neighbour query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalLink {
    /// Handle of the neighbour cell.
    pub cell: ExternalHandle,
    /// Edge index at which the neighbour sees the queried cell.
    pub edge: usize,
    /// Shape id of the neighbour.
    pub shape: usize,
}

/// Neighbour resolution supplied by an external map object.
pub trait ExternalMap {
    /// The origin cells, at distance zero.
    fn origins(&mut self) -> Vec<ExternalSeed>;

    /// The cell, incoming edge and shape across `edge` of `cell`.
    fn neighbor(&mut self, cell: ExternalHandle, edge: usize) -> ExternalLink;

    /// Distance of `cell` from the map's origin, when the map knows it.
    ///
    /// Only consulted under the `known_distances` strategy flag.
    fn distance(&mut self, _cell: ExternalHandle) -> Option<u32> {
        None
    }
}
