use std::ops::Bound;
use std::sync::Arc;

use crate::substrate::table::{EntryKey, Table};
use crate::substrate::Environment;
use crate::util::{Result, Status};

/// A forward cursor over one table, bound to at most one transaction.
///
/// The cursor tracks its position by entry key rather than by physical
/// slot, so it stays correct while its own transaction buffers writes and
/// while other transactions commit around it. A cursor without a
/// transaction reads the latest committed state on every fetch.
pub struct Cursor {
    env: Arc<Environment>,
    table: Arc<Table>,
    txn: Option<u64>,
    pos: Option<EntryKey>,
}

impl Cursor {
    pub(crate) fn new(env: Arc<Environment>, table: Arc<Table>, txn: Option<u64>) -> Self {
        Cursor {
            env,
            table,
            txn,
            pos: None,
        }
    }

    /// Position at the first entry whose user key is `>= target`.
    pub fn seek(&mut self, target: &[u8]) -> Result<Option<(EntryKey, Vec<u8>)>> {
        let lower = Bound::Included(self.table.entry_key(target.to_vec(), 0));
        self.fetch(lower)
    }

    /// Advance to the entry immediately after the current position.
    pub fn advance(&mut self) -> Result<Option<(EntryKey, Vec<u8>)>> {
        let pos = self
            .pos
            .clone()
            .ok_or_else(|| Status::generic_failure("cursor is not positioned"))?;
        self.fetch(Bound::Excluded(pos))
    }

    fn fetch(&mut self, lower: Bound<EntryKey>) -> Result<Option<(EntryKey, Vec<u8>)>> {
        let found = self.env.next_visible(self.txn, &self.table, lower)?;
        if let Some((key, _)) = &found {
            self.pos = Some(key.clone());
        }
        Ok(found)
    }
}
