use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::key::IndexSchema;
use crate::substrate::Table;

/// Shared per-index state: the immutable schema, the substrate table, and
/// two independently guarded pieces of mutable state.
///
/// The write-set (transactions that have mutated the index and not yet
/// completed) and the read-only flag live under one lock; the set of open
/// handles under a second. The two locks are never held at the same time.
/// The read-only flag is monotonic: set during deletion, never cleared.
pub struct IndexData {
    name: String,
    schema: IndexSchema,
    table: Arc<Table>,
    write_state: Mutex<WriteState>,
    handles: Mutex<HashSet<u64>>,
    next_handle_id: AtomicU64,
}

struct WriteState {
    read_only: bool,
    writers: HashSet<u64>,
}

impl std::fmt::Debug for IndexData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexData")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl IndexData {
    pub(crate) fn new(name: String, schema: IndexSchema, table: Arc<Table>) -> Arc<Self> {
        Arc::new(IndexData {
            name,
            schema,
            table,
            write_state: Mutex::new(WriteState {
                read_only: false,
                writers: HashSet::new(),
            }),
            handles: Mutex::new(HashSet::new()),
            next_handle_id: AtomicU64::new(1),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    pub(crate) fn table(&self) -> &Arc<Table> {
        &self.table
    }

    /// Register a modifying transaction. Fails (returns `false`) once the
    /// index has been made read-only: no further write may begin.
    pub(crate) fn begin_write(&self, txn: u64) -> bool {
        let mut state = self.write_state.lock();
        if state.read_only {
            return false;
        }
        state.writers.insert(txn);
        true
    }

    /// Drop a transaction from the write-set. Idempotent.
    pub(crate) fn end_write(&self, txn: u64) {
        let mut state = self.write_state.lock();
        state.writers.remove(&txn);
    }

    /// Flip the read-only flag, but only if no uncommitted writer remains.
    pub(crate) fn make_read_only(&self) -> bool {
        let mut state = self.write_state.lock();
        if !state.writers.is_empty() {
            return false;
        }
        state.read_only = true;
        true
    }

    pub(crate) fn is_read_only(&self) -> bool {
        self.write_state.lock().read_only
    }

    pub(crate) fn register_handle(&self) -> u64 {
        let id = self.next_handle_id.fetch_add(1, Ordering::Relaxed);
        self.handles.lock().insert(id);
        id
    }

    pub(crate) fn unregister_handle(&self, id: u64) {
        self.handles.lock().remove(&id);
    }

    #[cfg(test)]
    pub(crate) fn open_handle_count(&self) -> usize {
        self.handles.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::AttributeType;
    use crate::substrate::{BytewiseComparator, Environment};

    fn data() -> Arc<IndexData> {
        let env = Environment::new();
        let table = env
            .create_table("t", Arc::new(BytewiseComparator))
            .unwrap();
        let schema = IndexSchema::new(&[AttributeType::Int32]).unwrap();
        IndexData::new("t".to_string(), schema, table)
    }

    #[test]
    fn test_write_set_blocks_read_only() {
        let d = data();
        assert!(d.begin_write(1));
        assert!(!d.make_read_only());
        d.end_write(1);
        assert!(d.make_read_only());
    }

    #[test]
    fn test_read_only_blocks_new_writers() {
        let d = data();
        assert!(d.make_read_only());
        assert!(!d.begin_write(1));
        assert!(d.is_read_only());
    }

    #[test]
    fn test_end_write_is_idempotent() {
        let d = data();
        assert!(d.begin_write(1));
        d.end_write(1);
        d.end_write(1);
        assert!(d.make_read_only());
    }

    #[test]
    fn test_handle_registry() {
        let d = data();
        let a = d.register_handle();
        let b = d.register_handle();
        assert_ne!(a, b);
        assert_eq!(d.open_handle_count(), 2);
        d.unregister_handle(a);
        assert_eq!(d.open_handle_count(), 1);
    }
}
