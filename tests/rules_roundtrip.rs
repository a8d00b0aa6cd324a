// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Persistence round trips, the consumer map, and the external-map mode.

mod common;

use common::{heptagonal, init_logging, square};
use tiling_trees::{
    generate, Config, Engine, ExternalHandle, ExternalLink, ExternalMap, ExternalSeed, Rule,
    RuleSet, SeedMode, Shape, Connection, Tiling, TreeMap,
};

/// Serialize → parse → serialize is the identity.
#[test]
fn test_persist_round_trip() {
    init_logging();
    let rules = generate(&heptagonal(), &Config::default()).unwrap();
    let text = rules.serialize();
    let back = RuleSet::parse(&text).unwrap();
    assert_eq!(back.rule_root, rules.rule_root);
    assert_eq!(back.states.len(), rules.states.len());
    for (a, b) in rules.states.iter().zip(&back.states) {
        assert_eq!(a.sid, b.sid);
        assert_eq!(a.rules, b.rules);
        assert_eq!(a.is_root, b.is_root);
        assert_eq!(a.possible_parents, b.possible_parents);
    }
    assert_eq!(back.serialize(), text);
}

/// Materialise three rings of the heptagonal tree and check that every
/// node's parent link is sanctioned by the possible-parent table.
#[test]
fn test_treemap_parents_are_possible() {
    init_logging();
    let rules = generate(&heptagonal(), &Config::default()).unwrap();
    let mut map = TreeMap::new(&rules);

    let mut frontier = vec![map.root()];
    for _ in 0..3 {
        let mut next = Vec::new();
        for n in frontier {
            let valence = rules.states[map.state(n)].rules.len();
            for e in 0..valence {
                let (m, _) = map.ensure(n, e).unwrap();
                if map.distance(m) > map.distance(n) {
                    next.push(m);
                }
            }
        }
        frontier = next;
    }

    for n in map.nodes().collect::<Vec<_>>() {
        let st = map.state(n);
        if rules.states[st].is_root {
            continue;
        }
        let Some((p, pe)) = map.neighbor(n, 0) else { continue };
        let pst = map.state(p);
        assert!(
            rules.states[pst].is_root
                || rules.states[st].possible_parents.contains(&(pst, pe)),
            "node in state {st} has parent state {pst} at edge {pe}"
        );
        assert_eq!(map.distance(p), map.distance(n) - 1);
    }
}

/// A numeric square grid behind the [`ExternalMap`] trait.
///
/// Handles pack a coordinate pair; edges are 0=east, 1=north, 2=west,
/// 3=south, so the incoming edge is always the opposite one.
struct GridMap;

fn pack(x: i32, y: i32) -> ExternalHandle {
    ((x as u32 as u64) << 32) | (y as u32 as u64)
}

fn unpack(h: ExternalHandle) -> (i32, i32) {
    (((h >> 32) as u32) as i32, (h as u32) as i32)
}

impl ExternalMap for GridMap {
    fn origins(&mut self) -> Vec<ExternalSeed> {
        vec![ExternalSeed {
            cell: pack(0, 0),
            shape: 0,
        }]
    }

    fn neighbor(&mut self, cell: ExternalHandle, edge: usize) -> ExternalLink {
        let (x, y) = unpack(cell);
        let (nx, ny) = match edge {
            0 => (x + 1, y),
            1 => (x, y + 1),
            2 => (x - 1, y),
            _ => (x, y - 1),
        };
        ExternalLink {
            cell: pack(nx, ny),
            edge: (edge + 2) % 4,
            shape: 0,
        }
    }

    fn distance(&mut self, cell: ExternalHandle) -> Option<u32> {
        let (x, y) = unpack(cell);
        Some(x.unsigned_abs() + y.unsigned_abs())
    }
}

/// The shape catalogue matching [`GridMap`]'s edge labelling.
fn translation_square() -> Tiling {
    Tiling::new(vec![Shape {
        connections: (0..4).map(|i| Connection::new(0, (i + 2) % 4)).collect(),
        cycle_length: 4,
        vertex_valence: vec![4; 4],
    }])
    .unwrap()
}

/// Rule generation in numerical fallback mode, neighbours answered by
/// the external grid.
#[test]
fn test_external_map_mode() {
    init_logging();
    let mut cfg = Config::default();
    cfg.seed = SeedMode::External;
    cfg.strategy.numerical_fix = true;
    let mut engine = Engine::with_external(translation_square(), cfg, Box::new(GridMap));
    let rules = engine.generate().unwrap();

    let root = &rules.states[rules.rule_root];
    assert_eq!(root.rules.len(), 4);
    assert!(root.rules.iter().all(|r| r.child().is_some()));
    for ts in rules.states.iter().filter(|ts| !ts.is_root) {
        assert_eq!(ts.rules[0], Rule::Parent);
    }
}

/// The engine's own square-grid run must agree with what a loaded copy
/// of its rules reproduces.
#[test]
fn test_square_rules_survive_reload() {
    init_logging();
    let rules = generate(&square(), &Config::default()).unwrap();
    let reloaded = RuleSet::parse(&rules.serialize()).unwrap();
    let mut map = TreeMap::new(&reloaded);
    let root = map.root();
    for e in 0..4 {
        let (c, ce) = map.ensure(root, e).unwrap();
        assert_eq!(ce, 0);
        assert_eq!(map.distance(c), 1);
    }
}
