/// Order-preserving composite-key codec
///
/// Encodes a key as the concatenation of fixed-width attribute slots so
/// that plain byte order on the encoded form equals tuple order on the
/// decoded form:
///
/// - Int32/Int64: the sign bit is flipped (bias to unsigned) and the value
///   written big-endian. Raw two's-complement bytes would sort negative
///   values above positive ones; the bias restores numeric order.
/// - Varchar: raw bytes NUL-padded to `MAX_VARCHAR_LENGTH + 1`. Values
///   carry no NUL bytes, so padding preserves prefix ordering and the
///   first NUL marks the value length on decode.
///
/// Wildcard positions in a bound key encode as the type's minimum sentinel
/// (lower bound) or maximum sentinel (upper bound), placing the bound
/// below/above every concrete value at that position.
use std::cmp::Ordering;
use std::sync::Arc;

use bytes::{Buf, BufMut};

use crate::key::{Attribute, AttributeType, IndexSchema, Key, KeyBound, MAX_VARCHAR_LENGTH};
use crate::substrate::Comparator;

const VARCHAR_SLOT: usize = MAX_VARCHAR_LENGTH + 1;

#[derive(Debug, Clone)]
pub struct KeyCodec {
    schema: IndexSchema,
}

impl KeyCodec {
    pub fn new(schema: IndexSchema) -> Self {
        KeyCodec { schema }
    }

    pub fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    pub fn encoded_len(&self) -> usize {
        self.schema.encoded_len()
    }

    /// Encode a fully specified key. The key must already have been
    /// validated against the schema.
    pub fn encode_key(&self, key: &Key) -> Vec<u8> {
        debug_assert_eq!(key.attribute_count(), self.schema.attribute_count());
        let mut buf = Vec::with_capacity(self.schema.encoded_len());
        for attr in key.attributes() {
            put_attribute(&mut buf, attr);
        }
        buf
    }

    /// Encode a bound key, substituting min/max sentinels for wildcards.
    pub fn encode_bound(&self, bound: &KeyBound, upper: bool) -> Vec<u8> {
        debug_assert_eq!(bound.attribute_count(), self.schema.attribute_count());
        let mut buf = Vec::with_capacity(self.schema.encoded_len());
        for (i, attr) in bound.attributes().iter().enumerate() {
            match attr {
                Some(attr) => put_attribute(&mut buf, attr),
                None => put_sentinel(&mut buf, self.schema.types()[i], upper),
            }
        }
        buf
    }

    /// Decode a stored key. Offsets are schema-derived and fixed, so this
    /// has no error path for well-formed input.
    pub fn decode(&self, mut encoded: &[u8]) -> Key {
        debug_assert_eq!(encoded.len(), self.schema.encoded_len());
        let mut attributes = Vec::with_capacity(self.schema.attribute_count());
        for ty in self.schema.types() {
            let attr = match ty {
                AttributeType::Int32 => Attribute::Int32((encoded.get_u32() ^ SIGN32) as i32),
                AttributeType::Int64 => Attribute::Int64((encoded.get_u64() ^ SIGN64) as i64),
                AttributeType::Varchar => {
                    let slot = &encoded[..VARCHAR_SLOT];
                    let len = slot.iter().position(|b| *b == 0).unwrap_or(MAX_VARCHAR_LENGTH);
                    let value = slot[..len].to_vec();
                    encoded.advance(VARCHAR_SLOT);
                    Attribute::Varchar(value)
                }
            };
            attributes.push(attr);
        }
        Key::new(attributes)
    }
}

const SIGN32: u32 = 1 << 31;
const SIGN64: u64 = 1 << 63;

fn put_attribute(buf: &mut Vec<u8>, attr: &Attribute) {
    match attr {
        Attribute::Int32(v) => buf.put_u32(*v as u32 ^ SIGN32),
        Attribute::Int64(v) => buf.put_u64(*v as u64 ^ SIGN64),
        Attribute::Varchar(v) => {
            debug_assert!(v.len() <= MAX_VARCHAR_LENGTH);
            buf.put_slice(v);
            buf.put_bytes(0, VARCHAR_SLOT - v.len());
        }
    }
}

fn put_sentinel(buf: &mut Vec<u8>, ty: AttributeType, upper: bool) {
    match (ty, upper) {
        (AttributeType::Int32, false) => buf.put_u32(0),
        (AttributeType::Int32, true) => buf.put_u32(u32::MAX),
        (AttributeType::Int64, false) => buf.put_u64(0),
        (AttributeType::Int64, true) => buf.put_u64(u64::MAX),
        (AttributeType::Varchar, false) => buf.put_bytes(0, VARCHAR_SLOT),
        (AttributeType::Varchar, true) => {
            // Above every legal value; legal varchars are NUL-terminated
            // inside the slot.
            buf.put_bytes(0xff, MAX_VARCHAR_LENGTH);
            buf.put_u8(0);
        }
    }
}

/// B-tree comparator parameterized by one schema at index-creation time.
///
/// Compares encoded keys attribute by attribute, mirroring the tuple order
/// the codec already encodes into plain byte order. Handed to the substrate
/// table when the index is created; never re-resolved through any registry
/// during a compare.
pub struct SchemaComparator {
    schema: IndexSchema,
}

impl SchemaComparator {
    pub fn new(schema: IndexSchema) -> Arc<Self> {
        Arc::new(SchemaComparator { schema })
    }
}

impl Comparator for SchemaComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        debug_assert_eq!(a.len(), self.schema.encoded_len());
        debug_assert_eq!(b.len(), self.schema.encoded_len());
        let mut offset = 0;
        for ty in self.schema.types() {
            let width = ty.encoded_len();
            let (fa, fb) = (&a[offset..offset + width], &b[offset..offset + width]);
            // Each slot is encoded so that bytewise order is value order.
            match fa.cmp(fb) {
                Ordering::Equal => {}
                ord => return ord,
            }
            offset += width;
        }
        Ordering::Equal
    }
}
