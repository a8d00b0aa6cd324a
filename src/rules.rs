// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! The generated rule table: tree states, possible parents, persistence.
//!
//! A [`RuleSet`] is the output of a successful run: a vector of
//! [`TreeState`]s, the id of the root state, and the run counters. Each
//! state carries one [`Rule`] per edge, indexed in the state's own frame;
//! edge 0 of a non-root state is always its PARENT edge.
//!
//! The persisted text format is one `root` line followed by one `state`
//! line per state:
//!
//! ```text
//! root 0
//! state 0 1 1 2 1
//! state 0 PARENT 2 LEFT RIGHT 1
//! ```
//!
//! where each token after the shape id is a child state id or one of
//! `PARENT`/`LEFT`/`RIGHT`. On load, a state whose PARENT is not at edge 0
//! is rotated until it is, and the shift is recorded in the state's
//! `parent_dir`.

use std::fmt;
use std::fmt::Write as _;

use thiserror::Error;

use crate::stats::RunStats;

/// One entry of a state's rule vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    /// Crossing this edge spawns a child in the given state.
    Child(usize),
    /// This edge leads to the tree parent.
    Parent,
    /// The neighbour is reached by walking left around the tree.
    Left,
    /// The neighbour is reached by walking right around the tree.
    Right,
    /// Not yet resolved; never present in a finished rule set.
    Unknown,
}

impl Rule {
    /// The child state id, for [`Rule::Child`] entries.
    pub fn child(self) -> Option<usize> {
        match self {
            Rule::Child(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Child(s) => write!(f, "{s}"),
            Rule::Parent => write!(f, "PARENT"),
            Rule::Left => write!(f, "LEFT"),
            Rule::Right => write!(f, "RIGHT"),
            Rule::Unknown => write!(f, "?"),
        }
    }
}

/// One state of the inferred tree automaton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeState {
    pub id: usize,
    /// Shape id of the cells this state describes.
    pub sid: usize,
    /// Rotation between the describing cell's edge 0 and its parent edge;
    /// on loaded rule sets, the shift applied to put PARENT at edge 0.
    pub parent_dir: usize,
    /// One entry per edge, PARENT first for non-root states.
    pub rules: Vec<Rule>,
    /// The state describes origin cells (no PARENT entry).
    pub is_root: bool,
    /// Some infinite descendant chain exists.
    pub is_live: bool,
    /// Some state lists this one across a PARENT edge.
    pub is_possible_parent: bool,
    /// The `(parent state, edge)` pairs that can produce this state.
    pub possible_parents: Vec<(usize, usize)>,
}

/// The complete output of a rule-generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    pub states: Vec<TreeState>,
    /// Id of the state describing the origin.
    pub rule_root: usize,
    /// Counters of the run that produced this set.
    pub stats: RunStats,
}

/// Problems found while parsing a persisted rule set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleParseError {
    #[error("expected a 'root <id>' line first")]
    MissingRoot,
    #[error("line {line}: expected {expected}")]
    Expected { line: usize, expected: &'static str },
    #[error("line {line}: bad token '{token}'")]
    BadToken { line: usize, token: String },
    #[error("line {line}: more than one PARENT entry")]
    MultipleParents { line: usize },
    #[error("root state {root} is not defined")]
    BadRoot { root: usize },
    #[error("state {state} edge {edge} references undefined state {target}")]
    UndefinedState {
        state: usize,
        edge: usize,
        target: usize,
    },
}

impl RuleSet {
    /// Serialize to the persisted text format.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "root {}", self.rule_root);
        for ts in &self.states {
            let _ = write!(out, "state {}", ts.sid);
            for r in &ts.rules {
                let _ = write!(out, " {r}");
            }
            let _ = writeln!(out);
        }
        out
    }

    /// Parse the persisted text format.
    ///
    /// States with a PARENT entry away from edge 0 are rotated into
    /// canonical position; liveness and the possible-parent table are
    /// recomputed.
    pub fn parse(text: &str) -> Result<RuleSet, RuleParseError> {
        let mut root: Option<usize> = None;
        let mut states: Vec<TreeState> = Vec::new();

        for (lineno, raw) in text.lines().enumerate() {
            let line = lineno + 1;
            let body = raw.split('#').next().unwrap_or("").trim();
            if body.is_empty() {
                continue;
            }
            let mut tok = body.split_whitespace();
            match tok.next() {
                Some("root") => {
                    let t = tok.next().ok_or(RuleParseError::Expected {
                        line,
                        expected: "a state id after 'root'",
                    })?;
                    root = Some(parse_id(t, line)?);
                }
                Some("state") => {
                    if root.is_none() {
                        return Err(RuleParseError::MissingRoot);
                    }
                    let t = tok.next().ok_or(RuleParseError::Expected {
                        line,
                        expected: "a shape id after 'state'",
                    })?;
                    let sid = parse_id(t, line)?;
                    let mut rules = Vec::new();
                    for t in tok {
                        rules.push(match t {
                            "PARENT" => Rule::Parent,
                            "LEFT" => Rule::Left,
                            "RIGHT" => Rule::Right,
                            other => Rule::Child(parse_id(other, line)?),
                        });
                    }
                    if rules.is_empty() {
                        return Err(RuleParseError::Expected {
                            line,
                            expected: "at least one rule entry",
                        });
                    }
                    let parents: Vec<usize> = rules
                        .iter()
                        .enumerate()
                        .filter(|(_, r)| **r == Rule::Parent)
                        .map(|(i, _)| i)
                        .collect();
                    if parents.len() > 1 {
                        return Err(RuleParseError::MultipleParents { line });
                    }
                    let parent_dir = parents.first().copied().unwrap_or(0);
                    rules.rotate_left(parent_dir);
                    states.push(TreeState {
                        id: states.len(),
                        sid,
                        parent_dir,
                        rules,
                        is_root: parents.is_empty(),
                        is_live: true,
                        is_possible_parent: false,
                        possible_parents: Vec::new(),
                    });
                }
                Some(other) => {
                    return Err(RuleParseError::BadToken {
                        line,
                        token: other.to_string(),
                    })
                }
                None => unreachable!("blank lines are skipped"),
            }
        }

        let root = root.ok_or(RuleParseError::MissingRoot)?;
        if root >= states.len() {
            return Err(RuleParseError::BadRoot { root });
        }
        for ts in &states {
            for (edge, r) in ts.rules.iter().enumerate() {
                if let Rule::Child(s) = *r {
                    if s >= states.len() {
                        return Err(RuleParseError::UndefinedState {
                            state: ts.id,
                            edge,
                            target: s,
                        });
                    }
                }
            }
        }

        recompute_liveness(&mut states);
        compute_possible_parents(&mut states);
        Ok(RuleSet {
            states,
            rule_root: root,
            stats: RunStats::new(),
        })
    }
}

fn parse_id(t: &str, line: usize) -> Result<usize, RuleParseError> {
    t.parse().map_err(|_| RuleParseError::BadToken {
        line,
        token: t.to_string(),
    })
}

/// Mark states with no live child as dead, to fixpoint.
pub(crate) fn recompute_liveness(states: &mut [TreeState]) {
    for ts in states.iter_mut() {
        ts.is_live = true;
    }
    loop {
        let mut changes = 0;
        for id in 0..states.len() {
            if !states[id].is_live {
                continue;
            }
            let children = states[id]
                .rules
                .iter()
                .filter_map(|r| r.child())
                .filter(|&s| states[s].is_live)
                .count();
            if children == 0 {
                states[id].is_live = false;
                changes += 1;
            }
        }
        if changes == 0 {
            break;
        }
    }
}

/// Compute `is_possible_parent` and the per-state possible-parent lists.
///
/// A state is initially a possible parent iff some rule entry is PARENT;
/// states whose would-be parents are all themselves impossible are pruned
/// until a fixpoint is reached.
pub(crate) fn compute_possible_parents(states: &mut [TreeState]) {
    for ts in states.iter_mut() {
        ts.is_possible_parent = ts.rules.iter().any(|r| *r == Rule::Parent);
    }
    loop {
        for ts in states.iter_mut() {
            ts.possible_parents.clear();
        }
        for id in 0..states.len() {
            if !states[id].is_possible_parent {
                continue;
            }
            for rid in 0..states[id].rules.len() {
                if let Rule::Child(s) = states[id].rules[rid] {
                    states[s].possible_parents.push((id, rid));
                }
            }
        }
        let mut changes = 0;
        for ts in states.iter_mut() {
            if ts.is_possible_parent && ts.possible_parents.is_empty() {
                ts.is_possible_parent = false;
                changes += 1;
            }
        }
        if changes == 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    /// A toy automaton: root 0 spawns four cells of state 1; state 1 has a
    /// parent, two side edges and one child, also of state 1.
    fn toy() -> RuleSet {
        use Rule::*;
        let states = vec![
            state(0, 0, vec![Child(1), Child(1), Child(1), Child(1)]),
            state(1, 0, vec![Parent, Left, Child(1), Right]),
        ];
        let mut rs = RuleSet {
            states,
            rule_root: 0,
            stats: RunStats::new(),
        };
        recompute_liveness(&mut rs.states);
        compute_possible_parents(&mut rs.states);
        rs
    }

    #[test]
    fn test_possible_parents() {
        let rs = toy();
        assert!(!rs.states[0].is_possible_parent);
        assert!(rs.states[1].is_possible_parent);
        // state 1 can be produced by the root at any edge, or by itself
        // at edge 2
        assert!(rs.states[1].possible_parents.contains(&(1, 2)));
        assert_eq!(rs.states[1].possible_parents.len(), 1);
        assert_eq!(rs.states[0].possible_parents, vec![]);
    }

    #[test]
    fn test_liveness() {
        use Rule::*;
        let mut states = vec![
            state(0, 0, vec![Child(1), Child(2), Child(1), Child(1)]),
            state(1, 0, vec![Parent, Left, Child(1), Right]),
            // state 2 only ever spawns dead ends
            state(2, 0, vec![Parent, Left, Child(3), Right]),
            state(3, 0, vec![Parent, Left, Right, Right]),
        ];
        recompute_liveness(&mut states);
        assert!(states[0].is_live);
        assert!(states[1].is_live);
        assert!(!states[2].is_live);
        assert!(!states[3].is_live);
    }

    #[test]
    fn test_serialize_parse_round_trip() {
        let rs = toy();
        let text = rs.serialize();
        let back = RuleSet::parse(&text).unwrap();
        assert_eq!(back.rule_root, rs.rule_root);
        assert_eq!(back.states, rs.states);
        assert_eq!(back.serialize(), text);
    }

    #[test]
    fn test_parse_rotates_parent_to_front() {
        let text = "root 0\nstate 0 1 1 1 1\nstate 0 LEFT 1 PARENT RIGHT\n";
        let rs = RuleSet::parse(text).unwrap();
        assert_eq!(rs.states[1].parent_dir, 2);
        assert_eq!(
            rs.states[1].rules,
            vec![Rule::Parent, Rule::Right, Rule::Left, Rule::Child(1)]
        );
        assert!(!rs.states[1].is_root);
        assert!(rs.states[0].is_root);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            RuleSet::parse("state 0 1 1\n"),
            Err(RuleParseError::MissingRoot)
        ));
        assert!(matches!(
            RuleSet::parse("root 0\nstate 0 PARENT PARENT\n"),
            Err(RuleParseError::MultipleParents { line: 2 })
        ));
        assert!(matches!(
            RuleSet::parse("root 0\nstate 0 BANANA\n"),
            Err(RuleParseError::BadToken { .. })
        ));
        assert!(matches!(
            RuleSet::parse("root 3\nstate 0 0 0 0 0\n"),
            Err(RuleParseError::BadRoot { root: 3 })
        ));
        assert!(matches!(
            RuleSet::parse("root 0\nstate 0 7 LEFT RIGHT LEFT\n"),
            Err(RuleParseError::UndefinedState { target: 7, .. })
        ));
    }
}
