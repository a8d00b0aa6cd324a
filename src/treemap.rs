// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! A consumer of finished rule sets: materialise the tree, face by face.
//!
//! [`TreeMap`] spawns nodes on demand from a [`RuleSet`]. A `Child` rule
//! allocates a fresh node one ring further out; a `Parent` rule resolves
//! through the possible-parent table (deterministically: the first entry);
//! `Left`/`Right` rules walk around the tree, creating whatever they pass
//! over, until the matching opposite token closes the edge. Every node's
//! edges are indexed in its state's frame, so edge 0 of a non-root node
//! is its PARENT edge.

use thiserror::Error;

use crate::rules::{Rule, RuleSet};

/// Index of a node in a [`TreeMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct Node {
    state: usize,
    dist: i64,
    nbr: Vec<Option<(NodeId, usize)>>,
}

/// Problems encountered while materialising nodes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeMapError {
    #[error("state {state} has a PARENT edge but no possible parents")]
    NoPossibleParent { state: usize },
    #[error("rule set contains an unresolved entry at state {state} edge {edge}")]
    UnresolvedRule { state: usize, edge: usize },
    #[error("walking a sideways edge exceeded the step budget")]
    StepBudgetExceeded,
    #[error("sideways walk met an incompatible rule")]
    IncoherentSideways,
}

/// An unboundedly growing instantiation of a rule set.
pub struct TreeMap<'a> {
    rules: &'a RuleSet,
    nodes: Vec<Node>,
    /// Step budget for each sideways (LEFT/RIGHT) resolution.
    max_adv_steps: u32,
}

impl<'a> TreeMap<'a> {
    /// A map seeded with one root node in the rule set's root state.
    pub fn new(rules: &'a RuleSet) -> Self {
        let mut m = Self {
            rules,
            nodes: Vec::new(),
            max_adv_steps: 100,
        };
        m.spawn(rules.rule_root, 0);
        m
    }

    /// Override the sideways-walk step budget.
    pub fn with_step_budget(rules: &'a RuleSet, max_adv_steps: u32) -> Self {
        let mut m = Self::new(rules);
        m.max_adv_steps = max_adv_steps;
        m
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All node ids materialised so far.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    /// State id of a node.
    pub fn state(&self, n: NodeId) -> usize {
        self.nodes[n.index()].state
    }

    /// Tree distance of a node, relative to the seed node.
    pub fn distance(&self, n: NodeId) -> i64 {
        self.nodes[n.index()].dist
    }

    /// The neighbour already materialised across an edge, if any.
    pub fn neighbor(&self, n: NodeId, edge: usize) -> Option<(NodeId, usize)> {
        self.nodes[n.index()].nbr[edge]
    }

    fn spawn(&mut self, state: usize, dist: i64) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let valence = self.rules.states[state].rules.len();
        self.nodes.push(Node {
            state,
            dist,
            nbr: vec![None; valence],
        });
        id
    }

    fn connect(&mut self, a: NodeId, ae: usize, b: NodeId, be: usize) {
        self.nodes[a.index()].nbr[ae] = Some((b, be));
        self.nodes[b.index()].nbr[be] = Some((a, ae));
    }

    fn rule(&self, n: NodeId, edge: usize) -> Rule {
        self.rules.states[self.nodes[n.index()].state].rules[edge]
    }

    /// Materialise (or look up) the neighbour across `edge` of `n`,
    /// returning it together with its incoming edge.
    pub fn ensure(&mut self, n: NodeId, edge: usize) -> Result<(NodeId, usize), TreeMapError> {
        if let Some(hit) = self.nodes[n.index()].nbr[edge] {
            return Ok(hit);
        }
        let state = self.nodes[n.index()].state;
        let dist = self.nodes[n.index()].dist;
        match self.rule(n, edge) {
            Rule::Child(s) => {
                let child = self.spawn(s, dist + 1);
                self.connect(n, edge, child, 0);
                Ok((child, 0))
            }
            Rule::Parent => {
                let choices = &self.rules.states[state].possible_parents;
                let Some(&(pstate, pedge)) = choices.first() else {
                    return Err(TreeMapError::NoPossibleParent { state });
                };
                let parent = self.spawn(pstate, dist - 1);
                self.connect(n, edge, parent, pedge);
                Ok((parent, pedge))
            }
            side @ (Rule::Left | Rule::Right) => {
                let delta: i64 = if side == Rule::Left { -1 } else { 1 };
                let opposite = if side == Rule::Left {
                    Rule::Right
                } else {
                    Rule::Left
                };
                let mut at = n;
                let mut spin = rotate(self.valence_of(n), edge, delta);
                for _ in 0..self.max_adv_steps {
                    let r = self.rule(at, spin);
                    if r == opposite {
                        self.connect(n, edge, at, spin);
                        return Ok((at, spin));
                    }
                    if r == side || r == Rule::Parent || r.child().is_some() {
                        let (at1, spin1) = self.ensure(at, spin)?;
                        at = at1;
                        spin = rotate(self.valence_of(at), spin1, delta);
                        continue;
                    }
                    return Err(TreeMapError::IncoherentSideways);
                }
                Err(TreeMapError::StepBudgetExceeded)
            }
            Rule::Unknown => Err(TreeMapError::UnresolvedRule { state, edge }),
        }
    }

    fn valence_of(&self, n: NodeId) -> usize {
        self.nodes[n.index()].nbr.len()
    }
}

fn rotate(valence: usize, spin: usize, delta: i64) -> usize {
    (spin as i64 + delta).rem_euclid(valence as i64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{compute_possible_parents, recompute_liveness, TreeState};
    use crate::stats::RunStats;

    fn state(id: usize, sid: usize, rules: Vec<Rule>) -> TreeState {
        let is_root = !rules.contains(&Rule::Parent);
        TreeState {
            id,
            sid,
            parent_dir: 0,
            rules,
            is_root,
            is_live: true,
            is_possible_parent: false,
            possible_parents: Vec::new(),
        }
    }

    /// The square-grid rule set: a root with four children, then one
    /// state per quadrant boundary behaviour.
    fn square_rules() -> RuleSet {
        use Rule::*;
        let mut states = vec![
            state(0, 0, vec![Child(1), Child(1), Child(1), Child(1)]),
            state(1, 0, vec![Parent, Left, Child(2), Right]),
            state(2, 0, vec![Parent, Child(1), Child(2), Right]),
        ];
        recompute_liveness(&mut states);
        compute_possible_parents(&mut states);
        RuleSet {
            states,
            rule_root: 0,
            stats: RunStats::new(),
        }
    }

    #[test]
    fn test_children_spawn_outward() {
        let rs = square_rules();
        let mut m = TreeMap::new(&rs);
        let root = m.root();
        let (c, e) = m.ensure(root, 0).unwrap();
        assert_eq!(e, 0);
        assert_eq!(m.state(c), 1);
        assert_eq!(m.distance(c), 1);
        // asking again returns the same node
        assert_eq!(m.ensure(root, 0).unwrap(), (c, e));
    }

    #[test]
    fn test_parent_resolves_through_possible_parents() {
        let rs = square_rules();
        let mut m = TreeMap::new(&rs);
        let (c, _) = m.ensure(m.root(), 0).unwrap();
        let (gc, _) = m.ensure(c, 2).unwrap();
        let (p, pe) = m.ensure(gc, 0).unwrap();
        // the parent edge resolves to the already-connected parent
        assert_eq!(p, c);
        assert_eq!(pe, 2);
        let st = m.state(gc);
        assert!(rs.states[st]
            .possible_parents
            .iter()
            .any(|&(ps, _)| ps == m.state(p)));
    }

    #[test]
    fn test_sideways_edges_close() {
        let rs = square_rules();
        let mut m = TreeMap::new(&rs);
        let root = m.root();
        let (a, _) = m.ensure(root, 0).unwrap();
        // a's LEFT edge must land on the RIGHT edge of a sibling at the
        // same distance, mutually connected
        let (la, le) = m.ensure(a, 1).unwrap();
        assert_eq!(m.state(la), 1);
        assert_eq!(m.distance(la), 1);
        assert_eq!(m.rule(la, le), Rule::Right);
        assert_eq!(m.neighbor(la, le), Some((a, 1)));
    }
}
