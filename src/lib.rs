//! # mdindex
//!
//! A transactional multidimensional index: records carry composite typed
//! keys (int32 / int64 / varchar attributes in a fixed per-index order) and
//! opaque payloads, stored in an ordered structure whose sort order is the
//! tuple order of the key.
//!
//! ## Features
//!
//! - Composite keys with an order-preserving byte encoding, so range scans
//!   are plain byte-order walks
//! - Wildcard bounds: a range query may leave any key position open
//! - Duplicate keys, preserved as distinct records
//! - Read-committed transactions across any number of indices, with
//!   atomic visibility at commit
//! - Nested transactions behind update and delete, pinning the view their
//!   locate step runs against
//! - Per-key write locks with bounded wait; conflicts surface as deadlock
//!   errors rather than blocking indefinitely
//!
//! ## Example
//!
//! ```
//! use mdindex::{Attribute, AttributeType, Database, Key, KeyBound, Record};
//!
//! let db = Database::new();
//! db.create_index("employees", &[AttributeType::Int32, AttributeType::Varchar])?;
//!
//! let index = db.open_index("employees")?;
//! let key = Key::new(vec![Attribute::Int32(2241), Attribute::varchar("Harry")]);
//! index.insert(None, &Record::new(key, "Finance"))?;
//!
//! // Scan every record whose first attribute is at most 3000.
//! let min = KeyBound::new(vec![None, None]);
//! let max = KeyBound::new(vec![Some(Attribute::Int32(3000)), None]);
//! let mut iter = index.get_records(None, &min, &max)?;
//! while iter.next()? {
//!     let record = iter.value().unwrap();
//!     println!("{:?} => {:?}", record.key, record.payload);
//! }
//! # Ok::<(), mdindex::Status>(())
//! ```

pub mod catalog;
pub mod db;
pub mod index;
pub mod iterator;
pub mod key;
pub mod substrate;
pub mod transaction;
pub mod util;

pub use catalog::IndexCatalog;
pub use db::Database;
pub use index::{IndexHandle, MutateFlags};
pub use iterator::{IterState, RangeIterator};
pub use key::{
    Attribute, AttributeType, IndexSchema, Key, KeyBound, KeyCodec, Record, MAX_PAYLOAD_LENGTH,
    MAX_VARCHAR_LENGTH,
};
pub use transaction::{TransactionCoordinator, TransactionHandle};
pub use util::{Code, Result, Status};
