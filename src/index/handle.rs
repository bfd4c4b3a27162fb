use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::index::data::IndexData;
use crate::iterator::RangeIterator;
use crate::key::{IndexSchema, KeyBound, KeyCodec, Record};
use crate::substrate::{Cursor, EntryKey, Environment};
use crate::transaction::TransactionHandle;
use crate::util::{Result, Status};

/// Matching behavior for update and delete.
#[derive(Debug, Clone, Copy, Default)]
pub struct MutateFlags {
    /// Match on key alone; the record's payload is not compared.
    pub ignore_payload: bool,
    /// Apply the mutation to every matching duplicate, not just the first.
    pub match_duplicates: bool,
}

impl MutateFlags {
    pub fn ignore_payload(mut self) -> Self {
        self.ignore_payload = true;
        self
    }

    pub fn match_duplicates(mut self) -> Self {
        self.match_duplicates = true;
        self
    }
}

enum MutateOp {
    Overwrite(Vec<u8>),
    Remove,
}

/// An open handle to one index.
///
/// All record operations take an optional transaction. With `None` the
/// operation runs autocommitted in a transaction of its own; with a
/// transaction the write stays buffered and invisible to others until that
/// transaction commits.
///
/// Update and delete run their locate step inside a nested transaction so
/// the entries they walk are fixed at the state observed when the call
/// began, even while other transactions commit concurrently.
pub struct IndexHandle {
    id: u64,
    env: Arc<Environment>,
    data: Arc<IndexData>,
    codec: KeyCodec,
    closed: AtomicBool,
}

impl IndexHandle {
    pub(crate) fn open(env: Arc<Environment>, data: Arc<IndexData>) -> Self {
        let id = data.register_handle();
        let codec = KeyCodec::new(data.schema().clone());
        IndexHandle {
            id,
            env,
            data,
            codec,
            closed: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        self.data.name()
    }

    pub fn schema(&self) -> &IndexSchema {
        self.data.schema()
    }

    /// Structural compatibility of a record with this index.
    pub fn compatible(&self, record: &Record) -> bool {
        self.data.schema().check_record(record).is_ok()
    }

    /// Release this handle. A handle may be closed once; the index itself
    /// lives on until deleted.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(Status::unknown_index("index handle already closed"));
        }
        self.data.unregister_handle(self.id);
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Status::unknown_index("index handle is closed"));
        }
        Ok(())
    }

    /// Insert a record. Duplicate keys are allowed and preserved as
    /// distinct records.
    pub fn insert(&self, tx: Option<&TransactionHandle>, record: &Record) -> Result<()> {
        self.ensure_open()?;
        self.data.schema().check_record(record)?;
        let encoded = self.codec.encode_key(&record.key);

        match tx {
            Some(tx) => {
                if !self.data.begin_write(tx.id()) {
                    return Err(Status::unknown_index("index is being deleted"));
                }
                self.env
                    .put(tx.id(), self.data.table(), encoded, record.payload.clone())
            }
            None => {
                if self.data.is_read_only() {
                    return Err(Status::unknown_index("index is being deleted"));
                }
                let txn = self.env.begin(None)?;
                match self
                    .env
                    .put(txn, self.data.table(), encoded, record.payload.clone())
                {
                    Ok(()) => self.env.commit(txn),
                    Err(e) => {
                        let _ = self.env.abort(txn);
                        Err(e)
                    }
                }
            }
        }
    }

    /// Replace the payload of the record(s) matching `record` with
    /// `payload`, leaving their key position untouched.
    pub fn update(
        &self,
        tx: Option<&TransactionHandle>,
        record: &Record,
        payload: &[u8],
        flags: MutateFlags,
    ) -> Result<()> {
        if payload.len() > crate::key::MAX_PAYLOAD_LENGTH {
            return Err(Status::incompatible_record(format!(
                "payload exceeds {} bytes",
                crate::key::MAX_PAYLOAD_LENGTH
            )));
        }
        self.mutate(tx, record, MutateOp::Overwrite(payload.to_vec()), flags)
    }

    /// Delete the record(s) matching `record`.
    pub fn delete(
        &self,
        tx: Option<&TransactionHandle>,
        record: &Record,
        flags: MutateFlags,
    ) -> Result<()> {
        self.mutate(tx, record, MutateOp::Remove, flags)
    }

    /// Open a range scan over `[min, max]`. Wildcard positions in the
    /// bounds admit every value at that position.
    pub fn get_records(
        &self,
        tx: Option<&TransactionHandle>,
        min: &KeyBound,
        max: &KeyBound,
    ) -> Result<RangeIterator> {
        self.ensure_open()?;
        self.data.schema().check_bound(min)?;
        self.data.schema().check_bound(max)?;
        Ok(RangeIterator::new(
            Arc::clone(&self.env),
            Arc::clone(self.data.table()),
            self.codec.clone(),
            tx.map(|t| t.id()),
            min.clone(),
            max.clone(),
        ))
    }

    /// Locate-then-mutate core shared by update and delete.
    ///
    /// The whole operation runs in a nested transaction so the locate step
    /// reads a snapshot pinned at begin. The nested transaction commits
    /// both on success and on a clean miss (nothing was buffered in that
    /// case); any other failure aborts it, discarding partial work.
    fn mutate(
        &self,
        tx: Option<&TransactionHandle>,
        record: &Record,
        op: MutateOp,
        flags: MutateFlags,
    ) -> Result<()> {
        self.ensure_open()?;
        self.data.schema().check_record(record)?;

        let parent = tx.map(|t| t.id());
        let child = self.env.begin(parent)?;

        if !self.data.begin_write(child) {
            let _ = self.env.abort(child);
            return Err(Status::unknown_index("index is being deleted"));
        }

        let outcome = match self.locate_and_mutate(child, record, &op, flags) {
            Ok(()) => self.env.commit(child),
            Err(e) => {
                if e.is_not_found() {
                    let _ = self.env.commit(child);
                } else {
                    let _ = self.env.abort(child);
                }
                Err(e)
            }
        };

        // The enclosing transaction becomes a writer only once the nested
        // work succeeded. Registration happens while the child is still in
        // the write-set so deletion cannot slip in between.
        if outcome.is_ok()
            && let Some(root) = parent
        {
            self.data.begin_write(root);
        }
        self.data.end_write(child);
        outcome
    }

    fn locate_and_mutate(
        &self,
        txn: u64,
        record: &Record,
        op: &MutateOp,
        flags: MutateFlags,
    ) -> Result<()> {
        let target = self.codec.encode_key(&record.key);
        let mut cursor = Cursor::new(
            Arc::clone(&self.env),
            Arc::clone(self.data.table()),
            Some(txn),
        );

        // Locate the first entry with the target key that satisfies the
        // payload predicate.
        let mut found = cursor.seek(&target)?;
        let first = loop {
            let Some((key, payload)) = found else {
                return Err(Status::not_found("no matching record"));
            };
            if key.user() != target.as_slice() {
                return Err(Status::not_found("no matching record"));
            }
            if flags.ignore_payload || payload == record.payload {
                break key;
            }
            found = cursor.advance()?;
        };
        self.apply(txn, &first, op)?;

        if !flags.match_duplicates {
            return Ok(());
        }

        // Continue through the run of duplicates immediately following the
        // first hit, stopping at the first entry that no longer matches.
        loop {
            let next = cursor.advance().map_err(wrap_duplicate_failure)?;
            let Some((key, payload)) = next else {
                break;
            };
            if key.user() != target.as_slice() {
                break;
            }
            if !flags.ignore_payload && payload != record.payload {
                break;
            }
            self.apply(txn, &key, op).map_err(wrap_duplicate_failure)?;
        }
        Ok(())
    }

    fn apply(&self, txn: u64, key: &EntryKey, op: &MutateOp) -> Result<()> {
        match op {
            MutateOp::Overwrite(payload) => {
                self.env
                    .overwrite(txn, self.data.table(), key, payload.clone())
            }
            MutateOp::Remove => self.env.remove(txn, self.data.table(), key),
        }
    }
}

/// A failure after the first duplicate has already been mutated is no
/// longer a clean miss; it surfaces as a generic failure.
fn wrap_duplicate_failure(e: Status) -> Status {
    if e.is_not_found() {
        e
    } else {
        Status::generic_failure(format!("duplicate matching failed: {}", e))
    }
}
