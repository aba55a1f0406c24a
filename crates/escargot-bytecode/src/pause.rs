//! Pause-site bookkeeping for generator/async functions.
//!
//! Every `await`/`yield` needs the interpreter to be able to suspend and
//! later resume mid-expression. Resuming requires replaying whatever
//! enclosing constructs were mid-flight at the pause point (try/finally
//! frames, `with` scopes, loop iterators) — the "tail data"
//! refers to. `ByteCodeBlock::max_pause_statement_extra_data_length` is the
//! size the interpreter must reserve per activation to hold the largest
//! tail data any pause site in the function might need, mirroring the
//! source's `updateMaxPauseStatementExtraDataLength`.

use serde::{Deserialize, Serialize};

use crate::opcode::PauseKind;

/// One `await`/`yield`/generator-initialize site recorded for a function.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PauseSite {
    pub position: u32,
    pub kind: PauseKind,
    pub tail_data_length: u32,
}

/// Accumulates pause sites for one function body and tracks the running
/// maximum tail-data length across all of them.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PauseSiteTable {
    sites: Vec<PauseSite>,
    max_tail_data_length: u32,
}

impl PauseSiteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a pause site and folds its tail-data length into the
    /// function-wide maximum.
    pub fn record(&mut self, position: u32, kind: PauseKind, tail_data_length: u32) {
        self.max_tail_data_length = self.max_tail_data_length.max(tail_data_length);
        self.sites.push(PauseSite { position, kind, tail_data_length });
    }

    pub fn max_tail_data_length(&self) -> u32 {
        self.max_tail_data_length
    }

    pub fn sites(&self) -> &[PauseSite] {
        &self.sites
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_tail_data_length_tracks_largest_recorded_site() {
        let mut table = PauseSiteTable::new();
        table.record(4, PauseKind::Await, 8);
        table.record(20, PauseKind::Yield { wrap_with_iter_result: true }, 24);
        table.record(31, PauseKind::Await, 16);
        assert_eq!(table.max_tail_data_length(), 24);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn empty_table_has_zero_max() {
        let table = PauseSiteTable::new();
        assert_eq!(table.max_tail_data_length(), 0);
        assert!(table.is_empty());
    }
}
