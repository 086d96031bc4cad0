//! Store Module
//!
//! Defines the contract with the backing key-value store and provides an
//! in-memory reference implementation.
//!
//! The cache core never talks to a concrete store directly; everything goes
//! through the [`Store`] trait, which covers exactly the command set the
//! cache needs: string reads (`GET`/`MGET`), key enumeration (`KEYS`),
//! lexicographic range scans over ordered sets (`ZRANGEBYLEX`), and an
//! atomic multi-command write unit (transaction or server-side script).

mod memory;

pub use memory::MemoryStore;

use crate::error::Result;

// == Lexicographic Bound ==
/// One end of a lexicographic range over an ordered set's members.
///
/// Mirrors the `-`/`+`/`[m`/`(m` bound syntax of a ZRANGEBYLEX command.
/// Bounds are raw bytes: index members may contain bytes (such as the
/// `0xFF` upper-bound sentinel) that are not valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexBound {
    /// No bound on this end
    Unbounded,
    /// Members equal to the bound are included
    Inclusive(Vec<u8>),
    /// Members equal to the bound are excluded
    Exclusive(Vec<u8>),
}

// == Write Command ==
/// One write within an atomic batch passed to [`Store::exec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCommand {
    /// Store `value` under `key`, optionally expiring after `expire_secs`
    Set {
        key: String,
        value: Vec<u8>,
        expire_secs: Option<u64>,
    },
    /// Insert `member` into the ordered set at `key` (score fixed at 0)
    ZAdd { key: String, member: Vec<u8> },
    /// Remove `member` from the ordered set at `key`, if present
    ZRem { key: String, member: Vec<u8> },
    /// Delete every key matching `pattern` (string and ordered-set keys)
    DelMatching { pattern: String },
}

// == Store Trait ==
/// Contract with the backing key-value store.
///
/// Implementations must provide sorted-set members that compare by raw byte
/// order, and an [`exec`](Store::exec) that applies a batch atomically:
/// readers never observe a partially-applied batch, and a failed batch
/// leaves the store untouched.
///
/// The only key pattern the cache issues is a literal prefix followed by a
/// trailing `*`.
pub trait Store {
    /// Reads the value stored under `key`, or `None` if absent or expired.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Reads several keys in one round trip; absent keys yield `None` at
    /// their position.
    fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>>;

    /// Enumerates every live key matching `pattern`. Order is unspecified.
    fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// Scans the ordered set at `key` for members within `[min, max]`,
    /// in ascending byte order, returning at most `limit` members when a
    /// limit is given. A missing key yields an empty result.
    fn zrange_by_lex(
        &self,
        key: &str,
        min: &LexBound,
        max: &LexBound,
        limit: Option<usize>,
    ) -> Result<Vec<Vec<u8>>>;

    /// Applies `batch` as one atomic, isolated unit.
    fn exec(&self, batch: Vec<WriteCommand>) -> Result<()>;
}

// == Shared-Reference Impl ==
/// A shared reference to a store is itself a store, so several caches can
/// target one store instance.
impl<S: Store + ?Sized> Store for &S {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        (**self).mget(keys)
    }

    fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        (**self).keys(pattern)
    }

    fn zrange_by_lex(
        &self,
        key: &str,
        min: &LexBound,
        max: &LexBound,
        limit: Option<usize>,
    ) -> Result<Vec<Vec<u8>>> {
        (**self).zrange_by_lex(key, min, max, limit)
    }

    fn exec(&self, batch: Vec<WriteCommand>) -> Result<()> {
        (**self).exec(batch)
    }
}
