use std::sync::Arc;

use crate::catalog::IndexCatalog;
use crate::index::{IndexData, IndexHandle};
use crate::key::{AttributeType, IndexSchema, KeyCodec, SchemaComparator};
use crate::substrate::Environment;
use crate::transaction::{TransactionCoordinator, TransactionHandle};
use crate::util::{Result, Status};

/// The top-level entry point: index lifecycle plus transaction lifecycle.
///
/// A `Database` owns the substrate environment and the index catalog.
/// Everything else (handles, iterators, transactions) borrows from it via
/// reference counting, so a `Database` can be shared across threads behind
/// an `Arc`.
pub struct Database {
    env: Arc<Environment>,
    catalog: Arc<IndexCatalog>,
    coordinator: TransactionCoordinator,
}

impl Database {
    pub fn new() -> Self {
        let env = Environment::new();
        let catalog = Arc::new(IndexCatalog::new());
        let coordinator = TransactionCoordinator::new(Arc::clone(&env), Arc::clone(&catalog));
        Database {
            env,
            catalog,
            coordinator,
        }
    }

    /// Create an index with the given attribute layout. The attribute order
    /// given here fixes the sort order of every record in the index.
    pub fn create_index(&self, name: &str, types: &[AttributeType]) -> Result<()> {
        let schema = IndexSchema::new(types)?;
        let comparator = SchemaComparator::new(schema.clone());
        // Table creation doubles as the uniqueness gate for the name.
        let table = self
            .env
            .create_table(name, comparator)
            .map_err(|_| Status::index_exists(format!("index '{}' already exists", name)))?;
        let data = IndexData::new(name.to_string(), schema, table);
        if let Err(e) = self.catalog.insert(data) {
            self.env.drop_table(name);
            return Err(e);
        }
        Ok(())
    }

    /// Open a handle on an existing index.
    pub fn open_index(&self, name: &str) -> Result<IndexHandle> {
        let data = self
            .catalog
            .find(name)
            .ok_or_else(|| Status::unknown_index(format!("no index named '{}'", name)))?;
        Ok(IndexHandle::open(Arc::clone(&self.env), data))
    }

    /// Delete an index and all its records. Fails with an open-transactions
    /// error while any uncommitted transaction has modified the index;
    /// committed data of past transactions does not block deletion.
    pub fn delete_index(&self, name: &str) -> Result<()> {
        self.catalog.remove(name)?;
        self.env.drop_table(name);
        Ok(())
    }

    /// The schema an index was created with.
    pub fn index_schema(&self, name: &str) -> Result<IndexSchema> {
        self.catalog
            .find(name)
            .map(|data| data.schema().clone())
            .ok_or_else(|| Status::unknown_index(format!("no index named '{}'", name)))
    }

    /// The codec for an index's keys, usable independently of any handle.
    pub fn index_codec(&self, name: &str) -> Result<KeyCodec> {
        self.index_schema(name).map(KeyCodec::new)
    }

    pub fn begin_transaction(&self) -> Result<TransactionHandle> {
        self.coordinator.begin()
    }

    pub fn commit_transaction(&self, tx: TransactionHandle) -> Result<()> {
        self.coordinator.commit(tx)
    }

    pub fn abort_transaction(&self, tx: TransactionHandle) -> Result<()> {
        self.coordinator.abort(tx)
    }
}

impl Default for Database {
    fn default() -> Self {
        Database::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_open_delete() {
        let db = Database::new();
        db.create_index("emp", &[AttributeType::Int32]).unwrap();
        let handle = db.open_index("emp").unwrap();
        assert_eq!(handle.schema().attribute_count(), 1);
        handle.close().unwrap();
        db.delete_index("emp").unwrap();
        assert!(db.open_index("emp").is_err());
    }

    #[test]
    fn test_duplicate_index_name() {
        let db = Database::new();
        db.create_index("emp", &[AttributeType::Int32]).unwrap();
        let err = db
            .create_index("emp", &[AttributeType::Varchar])
            .unwrap_err();
        assert_eq!(err.code(), &crate::util::Code::IndexExists);
    }

    #[test]
    fn test_delete_unknown_index() {
        let db = Database::new();
        let err = db.delete_index("missing").unwrap_err();
        assert_eq!(err.code(), &crate::util::Code::UnknownIndex);
    }

    #[test]
    fn test_recreate_after_delete() {
        let db = Database::new();
        db.create_index("emp", &[AttributeType::Int32]).unwrap();
        db.delete_index("emp").unwrap();
        db.create_index("emp", &[AttributeType::Int64]).unwrap();
        assert_eq!(
            db.index_schema("emp").unwrap().types(),
            &[AttributeType::Int64]
        );
    }
}
