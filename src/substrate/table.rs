use std::cmp::Ordering;
use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

use crossbeam_skiplist::SkipMap;
use parking_lot::RwLock;

use crate::substrate::Comparator;

/// Sentinel for a version that has not been deleted.
const LIVE: u64 = u64::MAX;

/// Identity of one physical entry: the encoded user key plus the insertion
/// sequence that distinguishes duplicates of the same key.
///
/// Ordering delegates to the table's comparator for the user key and falls
/// back to insertion order among duplicates, so every entry has a stable,
/// total position that survives payload rewrites.
pub struct EntryKey {
    user: Vec<u8>,
    seq: u64,
    comparator: Arc<dyn Comparator>,
}

impl EntryKey {
    pub fn user(&self) -> &[u8] {
        &self.user
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl Clone for EntryKey {
    fn clone(&self) -> Self {
        EntryKey {
            user: self.user.clone(),
            seq: self.seq,
            comparator: Arc::clone(&self.comparator),
        }
    }
}

impl fmt::Debug for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryKey")
            .field("user", &self.user)
            .field("seq", &self.seq)
            .finish()
    }
}

impl PartialEq for EntryKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EntryKey {}

impl PartialOrd for EntryKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EntryKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.comparator
            .compare(&self.user, &other.user)
            .then(self.seq.cmp(&other.seq))
    }
}

/// One payload version of an entry. A version is visible to a reader at
/// epoch `e` iff `born <= e < dead`.
struct Version {
    born: u64,
    dead: u64,
    payload: Vec<u8>,
}

/// An ordered table of duplicate-preserving entries with epoch-based
/// visibility.
///
/// Entries are never physically removed: deleting closes the live version
/// (`dead = epoch`) and rewriting a payload closes the live version and
/// appends a successor at the same entry. This keeps cursor positions
/// stable under concurrent commits and lets pinned-epoch readers see a
/// consistent historical view.
pub struct Table {
    id: u32,
    name: String,
    comparator: Arc<dyn Comparator>,
    entries: SkipMap<EntryKey, RwLock<Vec<Version>>>,
}

impl Table {
    pub(crate) fn new(id: u32, name: String, comparator: Arc<dyn Comparator>) -> Arc<Self> {
        Arc::new(Table {
            id,
            name,
            comparator,
            entries: SkipMap::new(),
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Build an entry key bound to this table's comparator.
    pub(crate) fn entry_key(&self, user: Vec<u8>, seq: u64) -> EntryKey {
        EntryKey {
            user,
            seq,
            comparator: Arc::clone(&self.comparator),
        }
    }

    /// First committed entry at or after `lower` whose payload is visible
    /// at `epoch`. Buffered (uncommitted) writes are the transaction
    /// layer's concern, not the table's.
    pub(crate) fn next_committed(
        &self,
        lower: Bound<EntryKey>,
        epoch: u64,
    ) -> Option<(EntryKey, Vec<u8>)> {
        for entry in self.entries.range((lower, Bound::Unbounded)) {
            let versions = entry.value().read();
            if let Some(payload) = visible_payload(&versions, epoch) {
                return Some((entry.key().clone(), payload));
            }
        }
        None
    }

    pub(crate) fn apply_insert(&self, key: EntryKey, payload: Vec<u8>, epoch: u64) {
        self.entries.insert(
            key,
            RwLock::new(vec![Version {
                born: epoch,
                dead: LIVE,
                payload,
            }]),
        );
    }

    pub(crate) fn apply_overwrite(&self, key: &EntryKey, payload: Vec<u8>, epoch: u64) {
        if let Some(entry) = self.entries.get(key) {
            let mut versions = entry.value().write();
            close_live(&mut versions, epoch);
            versions.push(Version {
                born: epoch,
                dead: LIVE,
                payload,
            });
        }
    }

    pub(crate) fn apply_delete(&self, key: &EntryKey, epoch: u64) {
        if let Some(entry) = self.entries.get(key) {
            let mut versions = entry.value().write();
            close_live(&mut versions, epoch);
        }
    }
}

fn visible_payload(versions: &[Version], epoch: u64) -> Option<Vec<u8>> {
    versions
        .iter()
        .find(|v| v.born <= epoch && epoch < v.dead)
        .map(|v| v.payload.clone())
}

fn close_live(versions: &mut [Version], epoch: u64) {
    if let Some(v) = versions.iter_mut().find(|v| v.dead == LIVE) {
        v.dead = epoch;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substrate::BytewiseComparator;

    fn table() -> Arc<Table> {
        Table::new(1, "t".to_string(), Arc::new(BytewiseComparator))
    }

    #[test]
    fn test_entry_key_orders_by_user_then_seq() {
        let t = table();
        let a = t.entry_key(b"a".to_vec(), 5);
        let b = t.entry_key(b"a".to_vec(), 6);
        let c = t.entry_key(b"b".to_vec(), 0);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_visibility_epochs() {
        let t = table();
        let k = t.entry_key(b"k".to_vec(), 1);
        t.apply_insert(k.clone(), b"v1".to_vec(), 3);

        // Not yet born at epoch 2.
        assert!(t
            .next_committed(Bound::Included(k.clone()), 2)
            .is_none());
        let (_, payload) = t.next_committed(Bound::Included(k.clone()), 3).unwrap();
        assert_eq!(payload, b"v1");

        t.apply_overwrite(&k, b"v2".to_vec(), 5);
        let (_, payload) = t.next_committed(Bound::Included(k.clone()), 4).unwrap();
        assert_eq!(payload, b"v1");
        let (_, payload) = t.next_committed(Bound::Included(k.clone()), 5).unwrap();
        assert_eq!(payload, b"v2");

        t.apply_delete(&k, 7);
        let (_, payload) = t.next_committed(Bound::Included(k.clone()), 6).unwrap();
        assert_eq!(payload, b"v2");
        assert!(t.next_committed(Bound::Included(k), 7).is_none());
    }

    #[test]
    fn test_duplicates_are_distinct_entries() {
        let t = table();
        t.apply_insert(t.entry_key(b"k".to_vec(), 1), b"p".to_vec(), 1);
        t.apply_insert(t.entry_key(b"k".to_vec(), 2), b"p".to_vec(), 1);

        let first = t
            .next_committed(Bound::Included(t.entry_key(b"k".to_vec(), 0)), 1)
            .unwrap();
        let second = t
            .next_committed(Bound::Excluded(first.0.clone()), 1)
            .unwrap();
        assert_eq!(first.0.user(), second.0.user());
        assert_ne!(first.0.seq(), second.0.seq());
        assert!(t.next_committed(Bound::Excluded(second.0), 1).is_none());
    }
}
