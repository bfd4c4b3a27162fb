/// Composite-key data model
///
/// An index key is an ordered tuple of typed attributes. The attribute
/// order is fixed per index schema and semantically significant: it defines
/// the sort position of every record.
///
/// Two key shapes exist:
/// - [`Key`]: fully specified, used by records and exact lookups
/// - [`KeyBound`]: per-position optional, used by range queries where `None`
///   marks a wildcard (minimal value in a lower bound, maximal in an upper)
use std::cmp::Ordering;

mod codec;

pub use codec::{KeyCodec, SchemaComparator};

/// Maximum length in bytes of a varchar attribute value.
pub const MAX_VARCHAR_LENGTH: usize = 512;

/// Maximum length in bytes of a record payload.
pub const MAX_PAYLOAD_LENGTH: usize = 4096;

/// The three supported attribute types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    /// Fixed-width signed 32-bit integer
    Int32,
    /// Fixed-width signed 64-bit integer
    Int64,
    /// Byte string of at most [`MAX_VARCHAR_LENGTH`] bytes, no NUL bytes
    Varchar,
}

impl AttributeType {
    /// Encoded width of one attribute of this type.
    ///
    /// Varchars are stored NUL-padded to a fixed slot so that offsets into
    /// an encoded key are schema-derived constants.
    pub fn encoded_len(&self) -> usize {
        match self {
            AttributeType::Int32 => 4,
            AttributeType::Int64 => 8,
            AttributeType::Varchar => MAX_VARCHAR_LENGTH + 1,
        }
    }
}

/// A concrete typed scalar value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    Int32(i32),
    Int64(i64),
    Varchar(Vec<u8>),
}

impl Attribute {
    pub fn varchar(value: impl Into<Vec<u8>>) -> Self {
        Attribute::Varchar(value.into())
    }

    pub fn attribute_type(&self) -> AttributeType {
        match self {
            Attribute::Int32(_) => AttributeType::Int32,
            Attribute::Int64(_) => AttributeType::Int64,
            Attribute::Varchar(_) => AttributeType::Varchar,
        }
    }

    /// Compare two attributes of the same type.
    ///
    /// Callers have already validated both sides against one schema, so a
    /// type mismatch is a logic error, not a runtime condition.
    pub fn compare(&self, other: &Attribute) -> Ordering {
        match (self, other) {
            (Attribute::Int32(a), Attribute::Int32(b)) => a.cmp(b),
            (Attribute::Int64(a), Attribute::Int64(b)) => a.cmp(b),
            (Attribute::Varchar(a), Attribute::Varchar(b)) => a.cmp(b),
            _ => {
                debug_assert!(false, "attribute type mismatch in compare");
                Ordering::Equal
            }
        }
    }
}

/// A fully specified composite key: one concrete attribute per schema
/// position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    attributes: Vec<Attribute>,
}

impl Key {
    pub fn new(attributes: Vec<Attribute>) -> Self {
        Key { attributes }
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    /// Tuple comparison, attribute by attribute.
    pub fn compare(&self, other: &Key) -> Ordering {
        debug_assert_eq!(self.attributes.len(), other.attributes.len());
        for (a, b) in self.attributes.iter().zip(other.attributes.iter()) {
            match a.compare(b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl From<Vec<Attribute>> for Key {
    fn from(attributes: Vec<Attribute>) -> Self {
        Key::new(attributes)
    }
}

/// A bound key for range queries: `None` positions are wildcards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBound {
    attributes: Vec<Option<Attribute>>,
}

impl KeyBound {
    pub fn new(attributes: Vec<Option<Attribute>>) -> Self {
        KeyBound { attributes }
    }

    pub fn attributes(&self) -> &[Option<Attribute>] {
        &self.attributes
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    /// Leftmost position where `key` exceeds a defined attribute of this
    /// upper bound, or `None` if the key qualifies.
    ///
    /// A violation at position 0 means the scan has structurally left the
    /// primary sort order; later positions only disqualify the single
    /// candidate.
    pub fn first_violation_above(&self, key: &Key) -> Option<usize> {
        debug_assert_eq!(self.attributes.len(), key.attribute_count());
        for (i, bound) in self.attributes.iter().enumerate() {
            if let Some(bound) = bound
                && key.attributes()[i].compare(bound) == Ordering::Greater
            {
                return Some(i);
            }
        }
        None
    }

    /// True if every defined attribute of this lower bound is `<=` the
    /// corresponding key attribute.
    pub fn admits_as_lower(&self, key: &Key) -> bool {
        debug_assert_eq!(self.attributes.len(), key.attribute_count());
        for (i, bound) in self.attributes.iter().enumerate() {
            if let Some(bound) = bound
                && key.attributes()[i].compare(bound) == Ordering::Less
            {
                return false;
            }
        }
        true
    }
}

impl From<Key> for KeyBound {
    fn from(key: Key) -> Self {
        KeyBound {
            attributes: key.attributes.into_iter().map(Some).collect(),
        }
    }
}

/// A record: a concrete key plus an opaque payload.
///
/// Records are not unique; several records may share one key and are then
/// distinguished only by insertion identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Key,
    pub payload: Vec<u8>,
}

impl Record {
    pub fn new(key: Key, payload: impl Into<Vec<u8>>) -> Self {
        Record {
            key,
            payload: payload.into(),
        }
    }
}

/// An index schema: attribute count, ordered attribute types, and the
/// derived fixed encoded-key width. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSchema {
    types: Vec<AttributeType>,
    encoded_len: usize,
}

impl IndexSchema {
    pub fn new(types: &[AttributeType]) -> crate::util::Result<Self> {
        if types.is_empty() {
            return Err(crate::util::Status::incompatible_record(
                "index schema requires at least one attribute",
            ));
        }
        let encoded_len = types.iter().map(|t| t.encoded_len()).sum();
        Ok(IndexSchema {
            types: types.to_vec(),
            encoded_len,
        })
    }

    pub fn attribute_count(&self) -> usize {
        self.types.len()
    }

    pub fn types(&self) -> &[AttributeType] {
        &self.types
    }

    /// Fixed byte width of every encoded key of this schema.
    pub fn encoded_len(&self) -> usize {
        self.encoded_len
    }

    fn check_attribute(&self, position: usize, attr: &Attribute) -> crate::util::Result<()> {
        if attr.attribute_type() != self.types[position] {
            return Err(crate::util::Status::incompatible_record(format!(
                "attribute {} has type {:?}, schema expects {:?}",
                position,
                attr.attribute_type(),
                self.types[position]
            )));
        }
        if let Attribute::Varchar(v) = attr {
            if v.len() > MAX_VARCHAR_LENGTH {
                return Err(crate::util::Status::incompatible_record(format!(
                    "varchar attribute {} exceeds {} bytes",
                    position, MAX_VARCHAR_LENGTH
                )));
            }
            if v.contains(&0) {
                return Err(crate::util::Status::incompatible_record(format!(
                    "varchar attribute {} contains a NUL byte",
                    position
                )));
            }
        }
        Ok(())
    }

    /// Validate a concrete key against this schema.
    pub fn check_key(&self, key: &Key) -> crate::util::Result<()> {
        if key.attribute_count() != self.types.len() {
            return Err(crate::util::Status::incompatible_record(format!(
                "key has {} attributes, schema expects {}",
                key.attribute_count(),
                self.types.len()
            )));
        }
        for (i, attr) in key.attributes().iter().enumerate() {
            self.check_attribute(i, attr)?;
        }
        Ok(())
    }

    /// Validate a bound key; wildcard positions are always compatible.
    pub fn check_bound(&self, bound: &KeyBound) -> crate::util::Result<()> {
        if bound.attribute_count() != self.types.len() {
            return Err(crate::util::Status::incompatible_record(format!(
                "bound key has {} attributes, schema expects {}",
                bound.attribute_count(),
                self.types.len()
            )));
        }
        for (i, attr) in bound.attributes().iter().enumerate() {
            if let Some(attr) = attr {
                self.check_attribute(i, attr)?;
            }
        }
        Ok(())
    }

    /// Validate a record: key compatibility plus payload limit.
    pub fn check_record(&self, record: &Record) -> crate::util::Result<()> {
        self.check_key(&record.key)?;
        if record.payload.len() > MAX_PAYLOAD_LENGTH {
            return Err(crate::util::Status::incompatible_record(format!(
                "payload exceeds {} bytes",
                MAX_PAYLOAD_LENGTH
            )));
        }
        Ok(())
    }
}
