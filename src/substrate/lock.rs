use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::util::{Result, Status};

/// How long a writer waits on a contended key before the wait is reported
/// as a deadlock. Conflicts are never retried internally; the caller must
/// retry the whole transaction.
const LOCK_WAIT_TIMEOUT: Duration = Duration::from_millis(100);

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(5);

/// Exclusive per-(table, key) write locks.
///
/// Locks are owned by the root transaction of whichever transaction
/// acquired them, so a nested child never conflicts with its own parent,
/// and all locks fall away together when the root commits or aborts.
pub(crate) struct LockManager {
    locks: Mutex<HashMap<(u32, Vec<u8>), u64>>,
}

impl LockManager {
    pub(crate) fn new() -> Self {
        LockManager {
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn acquire(&self, table: u32, key: &[u8], owner: u64) -> Result<()> {
        let start = Instant::now();
        loop {
            {
                let mut locks = self.locks.lock();
                let holder = locks
                    .entry((table, key.to_vec()))
                    .or_insert(owner);
                if *holder == owner {
                    return Ok(());
                }
            }

            if start.elapsed() > LOCK_WAIT_TIMEOUT {
                return Err(Status::deadlock(format!(
                    "lock wait timed out on table {}",
                    table
                )));
            }
            std::thread::sleep(LOCK_RETRY_INTERVAL);
        }
    }

    /// Release every lock held by `owner`.
    pub(crate) fn release_owner(&self, owner: u64) {
        let mut locks = self.locks.lock();
        locks.retain(|_, holder| *holder != owner);
    }
}
