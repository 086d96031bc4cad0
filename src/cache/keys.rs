//! Key Scheme Module
//!
//! Derives store keys and index-member encodings from a namespace, a
//! record's primary id, and secondary attribute values.
//!
//! The layout is fixed and must not change, since it is shared with any
//! other client of the same store:
//! - primary entry: `"{namespace}:{id}"`
//! - secondary index: `"{namespace}-index:{name}"` (ordered set)
//! - index member: `value ++ 0x00 ++ id`, raw bytes, score always 0
//!
//! Members sort by raw byte order, so an index orders first by value, then
//! by id's byte-string order.

use crate::error::{CacheError, Result};
use crate::store::LexBound;

// == Public Constants ==
/// Byte separating the value and id portions of an index member.
///
/// Guaranteed absent from index values (enforced on every `put`).
pub const SEPARATOR: u8 = 0x00;

/// Upper-bound sentinel for range scans; sorts after every id byte.
pub const MEMBER_UPPER: u8 = 0xFF;

// == Key Scheme ==
/// Key and member derivation for one namespace.
#[derive(Debug, Clone)]
pub struct KeyScheme {
    /// Store-wide unique prefix scoping all keys of one cache instance
    namespace: String,
}

impl KeyScheme {
    // == Constructor ==
    /// Creates a scheme for the given namespace.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// The namespace this scheme derives keys for.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    // == Primary Keys ==
    /// Key of the primary entry for `id`.
    pub fn primary_key(&self, id: &str) -> String {
        format!("{}:{}", self.namespace, id)
    }

    /// Pattern matching every primary entry in the namespace.
    pub fn primary_pattern(&self) -> String {
        format!("{}:*", self.namespace)
    }

    // == Index Keys ==
    /// Key of the ordered set holding the named secondary index.
    pub fn index_key(&self, index_name: &str) -> String {
        format!("{}-index:{}", self.namespace, index_name)
    }

    /// Pattern matching every secondary index in the namespace.
    pub fn index_pattern(&self) -> String {
        format!("{}-index:*", self.namespace)
    }

    // == Member Encoding ==
    /// Encodes the composite index member for a (value, id) pair.
    ///
    /// Fails with [`CacheError::SeparatorViolation`] when `value` contains
    /// the separator byte; storing such a member would corrupt range scans
    /// for every reader of the index.
    pub fn encode_member(&self, index_name: &str, value: &str, id: &str) -> Result<Vec<u8>> {
        if value.as_bytes().contains(&SEPARATOR) {
            return Err(CacheError::SeparatorViolation {
                index: index_name.to_string(),
                value: value.to_string(),
            });
        }

        let mut member = Vec::with_capacity(value.len() + 1 + id.len());
        member.extend_from_slice(value.as_bytes());
        member.push(SEPARATOR);
        member.extend_from_slice(id.as_bytes());
        Ok(member)
    }

    /// Splits a member into its (value, id) byte portions at the first
    /// separator. Returns `None` for members without a separator.
    pub fn split_member(member: &[u8]) -> Option<(&[u8], &[u8])> {
        let at = member.iter().position(|byte| *byte == SEPARATOR)?;
        Some((&member[..at], &member[at + 1..]))
    }

    /// Extracts the id portion of a member as a string slice.
    pub fn member_id(member: &[u8]) -> Option<&str> {
        let (_, id) = Self::split_member(member)?;
        std::str::from_utf8(id).ok()
    }

    // == Range Bounds ==
    /// Bounds of the range holding every member with exactly this value:
    /// `[value 0x00, value 0x00 0xFF]`.
    pub fn value_bounds(value: &str) -> (LexBound, LexBound) {
        let mut min = Vec::with_capacity(value.len() + 1);
        min.extend_from_slice(value.as_bytes());
        min.push(SEPARATOR);

        let mut max = min.clone();
        max.push(MEMBER_UPPER);

        (LexBound::Inclusive(min), LexBound::Inclusive(max))
    }

    /// Lower bound for advancing past every member of the `cursor` group:
    /// the first member at or after `cursor 0x00 0xFF` belongs to a
    /// strictly greater value.
    pub fn group_advance(cursor: &str) -> LexBound {
        let mut bound = Vec::with_capacity(cursor.len() + 2);
        bound.extend_from_slice(cursor.as_bytes());
        bound.push(SEPARATOR);
        bound.push(MEMBER_UPPER);
        LexBound::Inclusive(bound)
    }
}
