use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::substrate::table::{EntryKey, Table};

/// A buffered mutation of one existing entry, keyed by the entry's
/// insertion sequence.
#[derive(Debug, Clone)]
pub(crate) enum Overlay {
    /// Entry is deleted.
    Tombstone,
    /// Entry's payload is rewritten in place.
    Payload(Vec<u8>),
}

/// All writes a transaction has buffered against one table.
///
/// `inserts` holds brand-new entries in key order (they participate in the
/// transaction's own scans); `overlays` holds rewrites and deletes of
/// entries owned by an ancestor or already committed. A transaction never
/// overlays its own insert: those are folded into `inserts` immediately.
pub(crate) struct TableBatch {
    pub(crate) table: Arc<Table>,
    pub(crate) inserts: BTreeMap<EntryKey, Vec<u8>>,
    pub(crate) overlays: HashMap<u64, (EntryKey, Overlay)>,
}

impl TableBatch {
    pub(crate) fn new(table: Arc<Table>) -> Self {
        TableBatch {
            table,
            inserts: BTreeMap::new(),
            overlays: HashMap::new(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.overlays.is_empty()
    }
}

/// State of one substrate transaction.
///
/// Root transactions read at the latest committed epoch on every access
/// (read committed). Nested transactions pin the epoch current at begin,
/// so a locate step running inside one cannot observe rows committed after
/// the enclosing call began.
pub(crate) struct TxnState {
    pub(crate) id: u64,
    pub(crate) parent: Option<u64>,
    /// Topmost ancestor; owns all locks acquired anywhere in the chain.
    pub(crate) root: u64,
    /// Pinned visibility epoch; `None` means read committed.
    pub(crate) read_epoch: Option<u64>,
    /// Buffered writes per table id.
    pub(crate) batches: HashMap<u32, TableBatch>,
}

impl TxnState {
    pub(crate) fn new(id: u64, parent: Option<u64>, root: u64, read_epoch: Option<u64>) -> Self {
        TxnState {
            id,
            parent,
            root,
            read_epoch,
            batches: HashMap::new(),
        }
    }

    pub(crate) fn batch_mut(&mut self, table: &Arc<Table>) -> &mut TableBatch {
        self.batches
            .entry(table.id())
            .or_insert_with(|| TableBatch::new(Arc::clone(table)))
    }
}
