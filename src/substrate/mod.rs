/// Ordered transactional key-value substrate
///
/// The index core only assumes an ordered store with transactions,
/// cursors, and a pluggable key comparator. This module is a minimal
/// in-memory implementation of that contract:
///
/// - [`Table`]: duplicate-preserving ordered entries with epoch-based
///   (MVCC) visibility
/// - [`Environment`]: table registry, transaction lifecycle (including
///   nested transactions), per-key write locks, commit epoch
/// - [`Cursor`]: forward scans merging committed state with the owning
///   transaction's buffered writes
///
/// Root transactions are read committed: they never observe another
/// transaction's uncommitted writes, but repeated reads may see different
/// committed states. Nested transactions pin their visibility epoch at
/// begin. Lock conflicts surface as a deadlock error after a bounded wait
/// and are never retried internally.
mod comparator;
mod cursor;
mod environment;
mod lock;
mod table;
mod txn;

pub use comparator::{BytewiseComparator, Comparator};
pub use cursor::Cursor;
pub use environment::Environment;
pub use table::{EntryKey, Table};
