// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Strict tree rules for periodic planar tessellations.
//!
//! Given a tiling described purely combinatorially, as shape prototypes
//! with edge-to-edge gluing, rotational symmetry steps and vertex
//! valences, this crate infers a finite deterministic tree automaton that
//! grows the tiling outward from a root face using only local
//! information. The
//! output is a table of [`TreeState`]s: per state, one [`Rule`] per edge
//! saying whether crossing it spawns a child (and in which state), leads
//! back to the parent, or is closed sideways through the tree.
//!
//! # Architecture
//!
//! The work happens in three tiers:
//!
//! 1. **A unified cell graph** (`graph`, `engine::topology`): cells are
//!    materialised lazily by walking edges; vertex-ring closure detects
//!    when two cells are names for one face and unifies them through a
//!    union-find carrying edge rotations.
//! 2. **Local analysis** (`engine::distance`, `engine::shortcut`,
//!    `engine::parent`, `engine::side`, `engine::analyzer`): every cell
//!    gets a distance, a canonical parent edge and a neighbourhood code;
//!    distance corrections feed a database of learned path shortcuts.
//! 3. **Rule inference** (`engine::iteration`, `engine::branch`,
//!    `engine::minimize`): cells sharing a code share a state; states
//!    acquire rule vectors, adjacent live branches are verified to close
//!    consistently, and the state table is minimised.
//!
//! Inconsistencies discovered on the way (a solid distance dropping, two
//! same-code cells disagreeing, a branch conflict) refine the analysis
//! and retry; budgets turn pathological inputs into a clean
//! [`GenError::Surrender`].
//!
//! # Example
//!
//! ```
//! use tiling_trees::{generate, Config, Tiling};
//!
//! // the hyperbolic tiling of heptagons, three around each vertex
//! let tiling = Tiling::regular(7, 3);
//! let rules = generate(&tiling, &Config::default()).unwrap();
//! assert!(rules.states.len() <= 10);
//! let root = &rules.states[rules.rule_root];
//! assert!(root.rules.iter().all(|r| r.child().is_some()));
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod external;
mod graph;
pub mod rules;
pub mod stats;
pub mod tiling;
pub mod treemap;

pub use config::{Config, SeedMode, Strategy};
pub use engine::{generate, Engine};
pub use error::{GenError, GenResult};
pub use external::{ExternalHandle, ExternalLink, ExternalMap, ExternalSeed};
pub use rules::{Rule, RuleSet, TreeState};
pub use stats::{Counter, RunStats};
pub use tiling::{Connection, Shape, Tiling, TilingError};
pub use treemap::{NodeId, TreeMap, TreeMapError};
