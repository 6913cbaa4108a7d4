//! Index key encoding.
//!
//! Index keys are byte strings compared lexicographically by the store. String
//! components are written with an escaped terminator so that concatenating
//! several of them can never be ambiguous:
//!
//! ```text
//! component := escaped(bytes) 0x00 0x01
//! escaped   := every 0x00 byte written as 0x00 0xFF
//! ```
//!
//! `("ab", "c")` and `("a", "bc")` therefore encode differently, and the
//! ordering of encoded keys follows the ordering of the component tuples.

use crate::core::error::{FedError, FedResult};
use crate::state::config_entry::{ConfigEntryKindQuery, KindName};
use bytes::{BufMut, Bytes, BytesMut};

const ESCAPE: u8 = 0x00;
const ESCAPED_NUL: u8 = 0xFF;
const TERMINATOR: u8 = 0x01;

/// Incremental builder for composite index keys.
#[derive(Debug, Default)]
pub struct IndexBuilder {
    buf: BytesMut,
}

impl IndexBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one string component.
    pub fn string(&mut self, s: &str) -> &mut Self {
        self.buf.reserve(s.len() + 2);
        for byte in s.as_bytes() {
            if *byte == ESCAPE {
                self.buf.put_slice(&[ESCAPE, ESCAPED_NUL]);
            } else {
                self.buf.put_u8(*byte);
            }
        }
        self.buf.put_slice(&[ESCAPE, TERMINATOR]);
        self
    }

    /// Append one string component, lower-cased first.
    pub fn lowercase(&mut self, s: &str) -> &mut Self {
        self.string(&s.to_lowercase())
    }

    /// Finish and return the encoded key.
    pub fn bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

/// A typed index query.
///
/// Each index accepts exactly one variant; handing it another is a caller bug
/// reported as [`FedError::InvalidArgument`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexQuery {
    /// Config entry identity (kind + name).
    KindName(KindName),
    /// Config entries of one kind.
    Kind(ConfigEntryKindQuery),
    /// ACL token secret.
    Secret(String),
    /// ACL token accessor ID.
    Accessor(String),
}

impl IndexQuery {
    /// Name of the variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::KindName(_) => "KindName",
            Self::Kind(_) => "ConfigEntryKindQuery",
            Self::Secret(_) => "Secret",
            Self::Accessor(_) => "Accessor",
        }
    }
}

/// Error for an index handed a query of the wrong type.
pub fn invalid_query_type(index: &str, query: &IndexQuery) -> FedError {
    FedError::invalid_argument(format!(
        "invalid type for {} query: {}",
        index,
        query.type_name()
    ))
}

/// One index of a table.
pub struct IndexSchema<V: 'static> {
    /// Index name.
    pub name: &'static str,
    /// Whether at most one row may map to a key.
    pub unique: bool,
    /// Key for a stored row.
    pub from_object: fn(&V) -> Bytes,
    /// Key for a query.
    pub from_query: fn(&IndexQuery) -> FedResult<Bytes>,
}

/// Table layout: the primary `id` index plus any secondary indexes.
pub struct TableSchema<V: 'static> {
    /// Table name.
    pub name: &'static str,
    /// Primary index; its keys identify rows.
    pub id: IndexSchema<V>,
    /// Secondary indexes.
    pub secondary: &'static [IndexSchema<V>],
}

impl<V: 'static> TableSchema<V> {
    /// Look up a secondary index by name.
    pub fn secondary_position(&self, index: &str) -> Option<usize> {
        self.secondary.iter().position(|idx| idx.name == index)
    }
}
