use std::collections::HashMap;
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::substrate::lock::LockManager;
use crate::substrate::table::{EntryKey, Table};
use crate::substrate::txn::{Overlay, TableBatch, TxnState};
use crate::substrate::Comparator;
use crate::util::{Result, Status};

/// The ordered transactional substrate: named tables, a transaction
/// registry, per-key write locks, and a global commit epoch.
///
/// All writes buffer in per-transaction batches. A nested commit merges
/// the child's batch into its parent; a root commit applies the batch to
/// the tables under a commit mutex and then publishes a new epoch, so a
/// transaction's writes become visible to others atomically and only at
/// commit (read committed isolation).
pub struct Environment {
    tables: RwLock<HashMap<String, Arc<Table>>>,
    next_table_id: AtomicU32,
    txns: Mutex<HashMap<u64, TxnState>>,
    next_txn_id: AtomicU64,
    next_seq: AtomicU64,
    epoch: AtomicU64,
    locks: LockManager,
    /// Serializes root commits so each gets a distinct epoch.
    commit_mu: Mutex<()>,
}

impl Environment {
    pub fn new() -> Arc<Self> {
        Arc::new(Environment {
            tables: RwLock::new(HashMap::new()),
            next_table_id: AtomicU32::new(1),
            txns: Mutex::new(HashMap::new()),
            next_txn_id: AtomicU64::new(1),
            next_seq: AtomicU64::new(1),
            epoch: AtomicU64::new(0),
            locks: LockManager::new(),
            commit_mu: Mutex::new(()),
        })
    }

    pub fn create_table(&self, name: &str, comparator: Arc<dyn Comparator>) -> Result<Arc<Table>> {
        let mut tables = self.tables.write();
        if tables.contains_key(name) {
            return Err(Status::generic_failure(format!(
                "table '{}' already exists",
                name
            )));
        }
        let id = self.next_table_id.fetch_add(1, Ordering::Relaxed);
        let table = Table::new(id, name.to_string(), comparator);
        tables.insert(name.to_string(), Arc::clone(&table));
        Ok(table)
    }

    /// Remove a table from the registry. Existing references stay usable;
    /// gating new writers is the index layer's concern.
    pub fn drop_table(&self, name: &str) {
        self.tables.write().remove(name);
    }

    /// Open a transaction. With a parent this is a nested transaction: it
    /// pins its parent's visibility epoch and its writes merge into the
    /// parent on commit.
    pub fn begin(&self, parent: Option<u64>) -> Result<u64> {
        let id = self.next_txn_id.fetch_add(1, Ordering::Relaxed);
        let mut txns = self.txns.lock();
        let state = match parent {
            None => TxnState::new(id, None, id, None),
            Some(parent_id) => {
                let parent_state = txns
                    .get(&parent_id)
                    .ok_or_else(|| Status::transaction_closed("parent transaction is closed"))?;
                let pinned = parent_state
                    .read_epoch
                    .unwrap_or_else(|| self.epoch.load(Ordering::Acquire));
                TxnState::new(id, Some(parent_id), parent_state.root, Some(pinned))
            }
        };
        txns.insert(id, state);
        Ok(id)
    }

    /// Buffer a new entry. Duplicate user keys are preserved as distinct
    /// entries distinguished by insertion sequence.
    pub fn put(&self, txn: u64, table: &Arc<Table>, user_key: Vec<u8>, payload: Vec<u8>) -> Result<()> {
        let root = self.root_of(txn)?;
        self.locks.acquire(table.id(), &user_key, root)?;

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let key = table.entry_key(user_key, seq);

        let mut txns = self.txns.lock();
        let state = active_mut(&mut txns, txn)?;
        state.batch_mut(table).inserts.insert(key, payload);
        Ok(())
    }

    /// Buffer a payload rewrite of an existing entry.
    pub fn overwrite(
        &self,
        txn: u64,
        table: &Arc<Table>,
        target: &EntryKey,
        payload: Vec<u8>,
    ) -> Result<()> {
        self.overlay(txn, table, target, Overlay::Payload(payload))
    }

    /// Buffer a delete of an existing entry.
    pub fn remove(&self, txn: u64, table: &Arc<Table>, target: &EntryKey) -> Result<()> {
        self.overlay(txn, table, target, Overlay::Tombstone)
    }

    fn overlay(
        &self,
        txn: u64,
        table: &Arc<Table>,
        target: &EntryKey,
        overlay: Overlay,
    ) -> Result<()> {
        let root = self.root_of(txn)?;
        self.locks.acquire(table.id(), target.user(), root)?;

        let mut txns = self.txns.lock();
        let state = active_mut(&mut txns, txn)?;
        let batch = state.batch_mut(table);
        // A transaction's own uncommitted insert is folded in place rather
        // than overlaid.
        if batch.inserts.contains_key(target) {
            match overlay {
                Overlay::Payload(p) => {
                    batch.inserts.insert(target.clone(), p);
                }
                Overlay::Tombstone => {
                    batch.inserts.remove(target);
                }
            }
            return Ok(());
        }
        batch.overlays.insert(target.seq(), (target.clone(), overlay));
        Ok(())
    }

    /// Commit a transaction. Nested: merge the batch into the parent.
    /// Root: apply the batch and publish a new epoch.
    pub fn commit(&self, txn: u64) -> Result<()> {
        let state = {
            let mut txns = self.txns.lock();
            txns.remove(&txn)
                .ok_or_else(|| Status::transaction_closed("transaction is closed"))?
        };

        match state.parent {
            Some(parent_id) => {
                let mut txns = self.txns.lock();
                let parent = txns.get_mut(&parent_id).ok_or_else(|| {
                    Status::generic_failure("parent transaction closed before nested commit")
                })?;
                merge_into_parent(parent, state.batches);
                Ok(())
            }
            None => {
                let _guard = self.commit_mu.lock();
                let next = self.epoch.load(Ordering::Acquire) + 1;
                for batch in state.batches.into_values() {
                    apply_batch(batch, next);
                }
                self.epoch.store(next, Ordering::Release);
                self.locks.release_owner(state.root);
                Ok(())
            }
        }
    }

    /// Roll a transaction back, discarding its buffered writes. Locks
    /// acquired anywhere in a chain belong to the root and are released
    /// only when the root resolves.
    pub fn abort(&self, txn: u64) -> Result<()> {
        let state = {
            let mut txns = self.txns.lock();
            txns.remove(&txn)
                .ok_or_else(|| Status::transaction_closed("transaction is closed"))?
        };
        if state.parent.is_none() {
            self.locks.release_owner(state.root);
        }
        Ok(())
    }

    fn root_of(&self, txn: u64) -> Result<u64> {
        let txns = self.txns.lock();
        txns.get(&txn)
            .map(|s| s.root)
            .ok_or_else(|| Status::transaction_closed("transaction is closed"))
    }

    /// Next entry at or after `lower` as seen by `txn` (or by a plain
    /// read-committed reader when `txn` is `None`): committed entries
    /// visible at the transaction's epoch, overlaid and merged with the
    /// chain's own buffered writes.
    pub(crate) fn next_visible(
        &self,
        txn: Option<u64>,
        table: &Arc<Table>,
        lower: Bound<EntryKey>,
    ) -> Result<Option<(EntryKey, Vec<u8>)>> {
        let txns = self.txns.lock();

        // Chain from the transaction outward to its root.
        let mut chain: Vec<&TxnState> = Vec::new();
        let mut cursor = txn;
        while let Some(id) = cursor {
            let state = txns
                .get(&id)
                .ok_or_else(|| Status::transaction_closed("transaction is closed"))?;
            cursor = state.parent;
            chain.push(state);
        }

        let epoch = chain
            .first()
            .and_then(|s| s.read_epoch)
            .unwrap_or_else(|| self.epoch.load(Ordering::Acquire));

        let mut lower = lower;
        loop {
            let committed = table.next_committed(lower.clone(), epoch);
            let buffered = chain
                .iter()
                .filter_map(|s| s.batches.get(&table.id()))
                .filter_map(|b| {
                    b.inserts
                        .range((lower.clone(), Bound::Unbounded))
                        .next()
                        .map(|(k, v)| (k.clone(), v.clone()))
                })
                .min_by(|a, b| a.0.cmp(&b.0));

            let (candidate, payload) = match (committed, buffered) {
                (None, None) => return Ok(None),
                (Some(c), None) => c,
                (None, Some(b)) => b,
                (Some(c), Some(b)) => {
                    if b.0 < c.0 {
                        b
                    } else {
                        c
                    }
                }
            };

            // The chain may have rewritten or deleted this entry (committed
            // or inserted by an outer transaction); the innermost overlay
            // wins.
            let overlay = chain
                .iter()
                .filter_map(|s| s.batches.get(&table.id()))
                .find_map(|b| b.overlays.get(&candidate.seq()));
            match overlay {
                Some((_, Overlay::Tombstone)) => {
                    lower = Bound::Excluded(candidate);
                    continue;
                }
                Some((_, Overlay::Payload(p))) => return Ok(Some((candidate, p.clone()))),
                None => return Ok(Some((candidate, payload))),
            }
        }
    }
}

fn active_mut<'a>(
    txns: &'a mut HashMap<u64, TxnState>,
    txn: u64,
) -> Result<&'a mut TxnState> {
    txns.get_mut(&txn)
        .ok_or_else(|| Status::transaction_closed("transaction is closed"))
}

fn merge_into_parent(parent: &mut TxnState, batches: HashMap<u32, TableBatch>) {
    for (table_id, child) in batches {
        if child.is_empty() {
            continue;
        }
        let parent_batch = parent
            .batches
            .entry(table_id)
            .or_insert_with(|| TableBatch::new(Arc::clone(&child.table)));
        for (key, payload) in child.inserts {
            parent_batch.inserts.insert(key, payload);
        }
        for (seq, (key, overlay)) in child.overlays {
            // An overlay of the parent's own uncommitted insert folds in
            // place, exactly as it would have inside the parent itself.
            if parent_batch.inserts.contains_key(&key) {
                match overlay {
                    Overlay::Payload(p) => {
                        parent_batch.inserts.insert(key, p);
                    }
                    Overlay::Tombstone => {
                        parent_batch.inserts.remove(&key);
                    }
                }
            } else {
                parent_batch.overlays.insert(seq, (key, overlay));
            }
        }
    }
}

fn apply_batch(batch: TableBatch, epoch: u64) {
    let table = batch.table;
    for (key, payload) in batch.inserts {
        table.apply_insert(key, payload, epoch);
    }
    for (_, (key, overlay)) in batch.overlays {
        match overlay {
            Overlay::Payload(p) => table.apply_overwrite(&key, p, epoch),
            Overlay::Tombstone => table.apply_delete(&key, epoch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substrate::BytewiseComparator;

    fn env_and_table() -> (Arc<Environment>, Arc<Table>) {
        let env = Environment::new();
        let table = env
            .create_table("t", Arc::new(BytewiseComparator))
            .unwrap();
        (env, table)
    }

    fn first(
        env: &Environment,
        txn: Option<u64>,
        table: &Arc<Table>,
    ) -> Option<(EntryKey, Vec<u8>)> {
        env.next_visible(
            txn,
            table,
            Bound::Included(table.entry_key(Vec::new(), 0)),
        )
        .unwrap()
    }

    #[test]
    fn test_uncommitted_writes_invisible_to_others() {
        let (env, table) = env_and_table();
        let t1 = env.begin(None).unwrap();
        env.put(t1, &table, b"k".to_vec(), b"v".to_vec()).unwrap();

        assert!(first(&env, None, &table).is_none());
        let t2 = env.begin(None).unwrap();
        assert!(first(&env, Some(t2), &table).is_none());
        // Visible to itself.
        assert!(first(&env, Some(t1), &table).is_some());

        env.commit(t1).unwrap();
        assert!(first(&env, None, &table).is_some());
        assert!(first(&env, Some(t2), &table).is_some());
        env.abort(t2).unwrap();
    }

    #[test]
    fn test_abort_discards_writes() {
        let (env, table) = env_and_table();
        let t1 = env.begin(None).unwrap();
        env.put(t1, &table, b"k".to_vec(), b"v".to_vec()).unwrap();
        env.abort(t1).unwrap();
        assert!(first(&env, None, &table).is_none());
    }

    #[test]
    fn test_nested_commit_merges_into_parent() {
        let (env, table) = env_and_table();
        let parent = env.begin(None).unwrap();
        let child = env.begin(Some(parent)).unwrap();
        env.put(child, &table, b"k".to_vec(), b"v".to_vec()).unwrap();
        env.commit(child).unwrap();

        // Still buffered in the parent, invisible outside.
        assert!(first(&env, None, &table).is_none());
        assert!(first(&env, Some(parent), &table).is_some());

        env.commit(parent).unwrap();
        assert!(first(&env, None, &table).is_some());
    }

    #[test]
    fn test_nested_pins_epoch() {
        let (env, table) = env_and_table();
        let parent = env.begin(None).unwrap();
        let child = env.begin(Some(parent)).unwrap();

        // Another transaction commits after the child began.
        let other = env.begin(None).unwrap();
        env.put(other, &table, b"k".to_vec(), b"v".to_vec()).unwrap();
        env.commit(other).unwrap();

        assert!(first(&env, Some(child), &table).is_none());
        // The read-committed parent sees it.
        assert!(first(&env, Some(parent), &table).is_some());

        env.abort(child).unwrap();
        env.abort(parent).unwrap();
    }

    #[test]
    fn test_overlay_delete_of_committed_entry() {
        let (env, table) = env_and_table();
        let t0 = env.begin(None).unwrap();
        env.put(t0, &table, b"k".to_vec(), b"v".to_vec()).unwrap();
        env.commit(t0).unwrap();

        let (key, _) = first(&env, None, &table).unwrap();
        let t1 = env.begin(None).unwrap();
        env.remove(t1, &table, &key).unwrap();

        // Gone for t1, still there for everyone else.
        assert!(first(&env, Some(t1), &table).is_none());
        assert!(first(&env, None, &table).is_some());

        env.commit(t1).unwrap();
        assert!(first(&env, None, &table).is_none());
    }

    #[test]
    fn test_write_conflict_is_deadlock() {
        let (env, table) = env_and_table();
        let t1 = env.begin(None).unwrap();
        env.put(t1, &table, b"k".to_vec(), b"v1".to_vec()).unwrap();

        let t2 = env.begin(None).unwrap();
        let err = env.put(t2, &table, b"k".to_vec(), b"v2".to_vec()).unwrap_err();
        assert!(err.is_deadlock());

        env.commit(t1).unwrap();
        // Lock released; t2 may proceed now.
        env.put(t2, &table, b"k".to_vec(), b"v2".to_vec()).unwrap();
        env.commit(t2).unwrap();
    }

    #[test]
    fn test_commit_of_closed_transaction() {
        let (env, _table) = env_and_table();
        let t1 = env.begin(None).unwrap();
        env.commit(t1).unwrap();
        let err = env.commit(t1).unwrap_err();
        assert_eq!(err.code(), &crate::util::Code::TransactionClosed);
    }
}
