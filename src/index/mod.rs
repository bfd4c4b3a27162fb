/// Index lifecycle and record operations
///
/// [`IndexData`] is the shared state behind an index; [`IndexHandle`] is an
/// opened view of one, carrying the record operations (insert, update,
/// delete, range scans). Handles are cheap; any number may be open against
/// the same index at once.
mod data;
mod handle;

pub use data::IndexData;
pub use handle::{IndexHandle, MutateFlags};
