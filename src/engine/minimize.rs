// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! State minimisation.
//!
//! Classic partition refinement: states start partitioned by analyzer key
//! and are split on the classes of their children until stable; each
//! final class keeps its first representative. Renumbering rewrites the
//! rule vectors, the code map and the root id.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{failure, GenResult};
use crate::rules::Rule;

use super::{Aid, Engine};

impl Engine {
    pub(crate) fn minimize_rules(&mut self) -> GenResult<()> {
        self.states_premini = self.states.len();
        let total = self.states.len();
        debug!(states = total, "minimising rules");

        let mut new_id = vec![0usize; total];
        let mut class_of_aid: FxHashMap<Aid, usize> = FxHashMap::default();
        for id in 0..total {
            let Some(giver) = self.states[id].giver else {
                return Err(failure("minimising a state without a giver"));
            };
            let aid = self.aid_of(giver)?;
            let next = class_of_aid.len();
            new_id[id] = *class_of_aid.entry(aid).or_insert(next);
        }
        let mut classes = class_of_aid.len();

        let mut last_classes = 0;
        while classes > last_classes && classes < total {
            last_classes = classes;
            let prev = new_id.clone();
            let mut hashes: FxHashMap<Vec<i64>, usize> = FxHashMap::default();
            for id in 0..total {
                let mut key: Vec<i64> = Vec::with_capacity(1 + self.states[id].rules.len());
                key.push(prev[id] as i64);
                for r in &self.states[id].rules {
                    key.push(match *r {
                        Rule::Child(s) => prev[s] as i64,
                        Rule::Parent => -2,
                        Rule::Left => -3,
                        Rule::Right => -4,
                        Rule::Unknown => -5,
                    });
                }
                let next = hashes.len();
                new_id[id] = *hashes.entry(key).or_insert(next);
            }
            classes = hashes.len();
        }
        debug!(from = total, to = classes, "minimisation settled");

        // keep the first representative of each class, in class order
        let mut old_id = vec![usize::MAX; classes];
        for i in 0..total {
            if old_id[new_id[i]] == usize::MAX {
                old_id[new_id[i]] = i;
            }
        }
        for i in 0..classes {
            let rep = self.states[old_id[i]].clone();
            self.states[i] = rep;
            self.states[i].id = i;
        }
        self.states.truncate(classes);
        for ts in &mut self.states {
            for r in &mut ts.rules {
                if let Rule::Child(s) = *r {
                    *r = Rule::Child(new_id[s]);
                }
            }
        }
        for v in self.code_to_id.values_mut() {
            *v = new_id[*v];
        }
        self.rule_root = new_id[self.rule_root];
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::engine::Engine;
    use crate::tiling::Tiling;

    /// Minimising an already-minimal rule set must not change the state
    /// count.
    #[test]
    fn test_minimisation_is_idempotent() {
        let mut e = Engine::new(Tiling::regular(4, 4), Config::default());
        e.generate().unwrap();
        let before = e.states.len();
        e.minimize_rules().unwrap();
        assert_eq!(e.states.len(), before);
    }
}
