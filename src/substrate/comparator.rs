use std::cmp::Ordering;

/// Key ordering for one substrate table.
///
/// A comparator is handed to the table at creation and owned by it for the
/// table's whole lifetime; compare operations never resolve anything by
/// name.
pub trait Comparator: Send + Sync {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;
}

/// Plain lexicographic byte order.
pub struct BytewiseComparator;

impl Comparator for BytewiseComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}
