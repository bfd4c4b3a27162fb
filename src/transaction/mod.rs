/// Top-level transaction lifecycle.
///
/// A [`TransactionHandle`] names one root transaction. Record operations
/// take it by reference; commit and abort consume it, so a resolved handle
/// cannot be reused. The coordinator also clears the transaction out of
/// every index write-set on resolution, releasing deletion gates.
use std::sync::Arc;

use crate::catalog::IndexCatalog;
use crate::substrate::Environment;
use crate::util::{Code, Result, Status};

#[derive(Debug)]
pub struct TransactionHandle {
    id: u64,
}

impl TransactionHandle {
    pub(crate) fn new(id: u64) -> Self {
        TransactionHandle { id }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

pub struct TransactionCoordinator {
    env: Arc<Environment>,
    catalog: Arc<IndexCatalog>,
}

impl TransactionCoordinator {
    pub(crate) fn new(env: Arc<Environment>, catalog: Arc<IndexCatalog>) -> Self {
        TransactionCoordinator { env, catalog }
    }

    pub fn begin(&self) -> Result<TransactionHandle> {
        self.env.begin(None).map(TransactionHandle::new)
    }

    /// Commit a transaction, making its writes visible atomically. If the
    /// commit itself fails the transaction is rolled back and the failure
    /// reported as an aborted transaction.
    pub fn commit(&self, tx: TransactionHandle) -> Result<()> {
        let id = tx.id();
        let result = match self.env.commit(id) {
            Ok(()) => Ok(()),
            Err(e) if e.code() == &Code::TransactionClosed => Err(e),
            Err(e) => {
                let _ = self.env.abort(id);
                Err(Status::transaction_aborted(format!(
                    "commit failed and was rolled back: {}",
                    e
                )))
            }
        };
        self.catalog.deregister_transaction(id);
        result
    }

    /// Roll a transaction back, discarding all its buffered writes.
    pub fn abort(&self, tx: TransactionHandle) -> Result<()> {
        let id = tx.id();
        let result = self.env.abort(id);
        self.catalog.deregister_transaction(id);
        result
    }
}
