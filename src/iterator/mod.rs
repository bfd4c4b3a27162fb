/// Range iterators over one index.
///
/// A [`RangeIterator`] walks the encoded-key order between a lower and an
/// upper bound key. The lower bound seeds the initial seek; both bounds are
/// then re-checked attribute by attribute against every candidate, because
/// a wildcard at an earlier position admits keys whose later positions fall
/// outside the bound.
///
/// An upper-bound violation at the first attribute ends the scan for good:
/// encoded order is primary-attribute order, so nothing further can
/// qualify. A violation at any later position only skips that candidate.
use std::sync::Arc;

use crate::key::{KeyBound, KeyCodec, Record};
use crate::substrate::{Cursor, Environment, Table};
use crate::util::{Result, Status};

/// Iterator lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterState {
    /// Created, not yet advanced.
    Unopened,
    /// Positioned on a record; [`RangeIterator::value`] returns it.
    Positioned,
    /// Ran off the end of the range. Advancing again stays here.
    Ended,
    /// Explicitly closed. Any further use is an error.
    Closed,
    /// A fetch failed; the iterator is unusable.
    Failed,
}

pub struct RangeIterator {
    codec: KeyCodec,
    min: KeyBound,
    max: KeyBound,
    seek_target: Vec<u8>,
    /// Present only while the scan can still advance; terminal states
    /// release the cursor.
    cursor: Option<Cursor>,
    state: IterState,
    current: Option<Record>,
}

impl std::fmt::Debug for RangeIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeIterator")
            .field("min", &self.min)
            .field("max", &self.max)
            .field("seek_target", &self.seek_target)
            .field("state", &self.state)
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

impl RangeIterator {
    pub(crate) fn new(
        env: Arc<Environment>,
        table: Arc<Table>,
        codec: KeyCodec,
        txn: Option<u64>,
        min: KeyBound,
        max: KeyBound,
    ) -> Self {
        let seek_target = codec.encode_bound(&min, false);
        RangeIterator {
            codec,
            min,
            max,
            seek_target,
            cursor: Some(Cursor::new(env, table, txn)),
            state: IterState::Unopened,
            current: None,
        }
    }

    pub fn state(&self) -> IterState {
        self.state
    }

    /// Advance to the next record in the range. Returns `false` once the
    /// range is exhausted; the iterator then stays ended.
    pub fn next(&mut self) -> Result<bool> {
        match self.state {
            IterState::Closed => return Err(Status::iterator_closed("iterator has been closed")),
            IterState::Failed => {
                return Err(Status::generic_failure("iterator has already failed"));
            }
            IterState::Ended => return Ok(false),
            IterState::Unopened | IterState::Positioned => {}
        }

        let first = self.state == IterState::Unopened;
        let Some(mut cursor) = self.cursor.take() else {
            self.state = IterState::Failed;
            return Err(Status::generic_failure("iterator lost its cursor"));
        };

        let mut fetched = if first {
            cursor.seek(&self.seek_target)
        } else {
            cursor.advance()
        };
        loop {
            match fetched {
                Err(e) => {
                    self.state = IterState::Failed;
                    self.current = None;
                    return Err(Status::generic_failure(format!("range scan failed: {}", e)));
                }
                Ok(None) => {
                    self.state = IterState::Ended;
                    self.current = None;
                    return Ok(false);
                }
                Ok(Some((key, payload))) => {
                    let decoded = self.codec.decode(key.user());
                    if let Some(position) = self.max.first_violation_above(&decoded) {
                        if position == 0 {
                            self.state = IterState::Ended;
                            self.current = None;
                            return Ok(false);
                        }
                        fetched = cursor.advance();
                        continue;
                    }
                    if !self.min.admits_as_lower(&decoded) {
                        fetched = cursor.advance();
                        continue;
                    }
                    self.current = Some(Record::new(decoded, payload));
                    self.state = IterState::Positioned;
                    self.cursor = Some(cursor);
                    return Ok(true);
                }
            }
        }
    }

    /// The record currently under the iterator, if positioned.
    pub fn value(&self) -> Option<&Record> {
        match self.state {
            IterState::Positioned => self.current.as_ref(),
            _ => None,
        }
    }

    /// Advance and return the next record, or a not-found error when the
    /// range is exhausted.
    pub fn get_next(&mut self) -> Result<Record> {
        if self.next()? {
            self.current
                .clone()
                .ok_or_else(|| Status::generic_failure("iterator lost its record"))
        } else {
            Err(Status::not_found("range exhausted"))
        }
    }

    /// Close the iterator. Closing twice is an error.
    pub fn close(&mut self) -> Result<()> {
        if self.state == IterState::Closed {
            return Err(Status::iterator_closed("iterator already closed"));
        }
        self.state = IterState::Closed;
        self.cursor = None;
        self.current = None;
        Ok(())
    }
}
