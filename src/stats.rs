// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Run counters.
//!
//! Counters are stored in a flat array indexed by [`Counter`], and are
//! incremented by the engine as the corresponding events occur. A copy of
//! the final values is attached to the generated rule set so callers can
//! report how much work a run took.

use strum::EnumCount;
use strum_macros::EnumCount as EnumCountMacro;

/// Observable events of a rule-generation run.
#[derive(EnumCountMacro, Copy, Clone, Debug)]
#[repr(u8)]
pub enum Counter {
    /// Cells allocated in the unified graph.
    CellsCreated,
    /// Cells absorbed into another cell by unification.
    CellsUnified,
    /// Edge traversals.
    Moves,
    /// Cells whose parent direction needed the exhaustive tie-break.
    HardParents,
    /// Parent directions resolved.
    ParentUpdates,
    /// Solid cells whose distance had to be lowered.
    SolidErrors,
    /// Path-pair shortcuts learned.
    ShortcutsLearned,
    /// Rules iterations started.
    Attempts,
}

/// Counter values for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    counts: [u64; Counter::COUNT],
}

impl RunStats {
    pub fn new() -> Self {
        RunStats::default()
    }

    /// Increment the specified counter by 1.
    pub(crate) fn inc(&mut self, counter: Counter) {
        self.counts[counter as usize] += 1;
    }

    /// Get the current value of the specified counter.
    pub fn get(&self, counter: Counter) -> u64 {
        self.counts[counter as usize]
    }

    /// Reset every counter to zero.
    pub(crate) fn reset(&mut self) {
        self.counts = [0; Counter::COUNT];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_and_get() {
        let mut s = RunStats::new();
        assert_eq!(s.get(Counter::CellsCreated), 0);
        s.inc(Counter::CellsCreated);
        s.inc(Counter::CellsCreated);
        s.inc(Counter::Attempts);
        assert_eq!(s.get(Counter::CellsCreated), 2);
        assert_eq!(s.get(Counter::Attempts), 1);
        assert_eq!(s.get(Counter::SolidErrors), 0);
    }

    #[test]
    fn test_reset() {
        let mut s = RunStats::new();
        s.inc(Counter::Moves);
        s.reset();
        assert_eq!(s.get(Counter::Moves), 0);
    }
}
