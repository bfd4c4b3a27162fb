/// Name-keyed registry of live indices.
///
/// Creation and deletion go through here. Deletion is gated on the index
/// write-set: an index with uncommitted writers cannot be removed, and a
/// successfully removed index is first made read-only so no writer can
/// register concurrently.
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::index::IndexData;
use crate::util::{Result, Status};

pub struct IndexCatalog {
    indices: RwLock<HashMap<String, Arc<IndexData>>>,
}

impl IndexCatalog {
    pub fn new() -> Self {
        IndexCatalog {
            indices: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn insert(&self, data: Arc<IndexData>) -> Result<()> {
        let mut indices = self.indices.write();
        if indices.contains_key(data.name()) {
            return Err(Status::index_exists(format!(
                "index '{}' already exists",
                data.name()
            )));
        }
        indices.insert(data.name().to_string(), data);
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<Arc<IndexData>> {
        self.indices.read().get(name).cloned()
    }

    /// Remove an index, failing if any transaction still holds uncommitted
    /// writes against it.
    pub(crate) fn remove(&self, name: &str) -> Result<Arc<IndexData>> {
        let mut indices = self.indices.write();
        let data = indices
            .get(name)
            .cloned()
            .ok_or_else(|| Status::unknown_index(format!("no index named '{}'", name)))?;
        if !data.make_read_only() {
            return Err(Status::open_transactions(format!(
                "index '{}' has uncommitted modifying transactions",
                name
            )));
        }
        indices.remove(name);
        Ok(data)
    }

    /// Drop a resolved transaction from every index write-set. Called on
    /// commit and abort alike.
    pub(crate) fn deregister_transaction(&self, txn: u64) {
        let indices = self.indices.read();
        for data in indices.values() {
            data.end_write(txn);
        }
    }
}

impl Default for IndexCatalog {
    fn default() -> Self {
        IndexCatalog::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{AttributeType, IndexSchema};
    use crate::substrate::{BytewiseComparator, Environment};

    fn make(name: &str) -> Arc<IndexData> {
        let env = Environment::new();
        let table = env
            .create_table(name, Arc::new(BytewiseComparator))
            .unwrap();
        let schema = IndexSchema::new(&[AttributeType::Int32]).unwrap();
        IndexData::new(name.to_string(), schema, table)
    }

    #[test]
    fn test_insert_rejects_duplicate_name() {
        let catalog = IndexCatalog::new();
        catalog.insert(make("a")).unwrap();
        let err = catalog.insert(make("a")).unwrap_err();
        assert_eq!(err.code(), &crate::util::Code::IndexExists);
    }

    #[test]
    fn test_remove_blocked_by_writer() {
        let catalog = IndexCatalog::new();
        let data = make("a");
        catalog.insert(Arc::clone(&data)).unwrap();
        assert!(data.begin_write(7));

        let err = catalog.remove("a").unwrap_err();
        assert_eq!(err.code(), &crate::util::Code::OpenTransactions);

        catalog.deregister_transaction(7);
        catalog.remove("a").unwrap();
        assert!(catalog.find("a").is_none());
    }

    #[test]
    fn test_remove_unknown() {
        let catalog = IndexCatalog::new();
        let err = catalog.remove("missing").unwrap_err();
        assert_eq!(err.code(), &crate::util::Code::UnknownIndex);
    }
}
