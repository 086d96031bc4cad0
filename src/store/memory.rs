//! Memory Store Module
//!
//! In-process reference implementation of the [`Store`] contract, backed by
//! ordered maps behind a single lock. Suitable for tests and for embedding
//! the cache without an external store.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use crate::error::{CacheError, Result};
use crate::store::{LexBound, Store, WriteCommand};

// == String Entry ==
/// A stored string value with optional expiry.
#[derive(Debug, Clone)]
struct Entry {
    /// The stored payload
    value: Vec<u8>,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    expires_at: Option<i64>,
}

impl Entry {
    /// Creates an entry with an optional TTL in seconds.
    fn new(value: Vec<u8>, ttl_seconds: Option<u64>) -> Self {
        let expires_at = ttl_seconds.map(|ttl| Utc::now().timestamp_millis() + (ttl as i64) * 1000);
        Self { value, expires_at }
    }

    /// An entry is expired once the current time reaches its expiration
    /// time; entries without a TTL never expire.
    fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires) => Utc::now().timestamp_millis() >= expires,
            None => false,
        }
    }
}

// == Inner State ==
/// All store state, guarded by one mutex so `exec` batches are atomic and
/// isolated.
#[derive(Debug, Default)]
struct Inner {
    /// String keyspace
    strings: BTreeMap<String, Entry>,
    /// Ordered-set keyspace; members compare by raw byte order
    zsets: BTreeMap<String, BTreeSet<Vec<u8>>>,
}

// == Memory Store ==
/// In-memory [`Store`] with lazy TTL expiry.
///
/// Expired entries are dropped when a read touches them; there is no
/// background sweeper.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| CacheError::StoreUnavailable("memory store lock poisoned".to_string()))
    }
}

/// Matches a key against a literal pattern with an optional trailing `*`.
fn key_matches(pattern: &str, key: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}

impl Inner {
    /// Reads a live string entry, dropping it if expired.
    fn read(&mut self, key: &str) -> Option<Vec<u8>> {
        match self.strings.get(key) {
            Some(entry) if entry.is_expired() => {
                self.strings.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    fn apply(&mut self, command: WriteCommand) {
        match command {
            WriteCommand::Set {
                key,
                value,
                expire_secs,
            } => {
                self.strings.insert(key, Entry::new(value, expire_secs));
            }
            WriteCommand::ZAdd { key, member } => {
                self.zsets.entry(key).or_default().insert(member);
            }
            WriteCommand::ZRem { key, member } => {
                if let Some(set) = self.zsets.get_mut(&key) {
                    set.remove(&member);
                    if set.is_empty() {
                        self.zsets.remove(&key);
                    }
                }
            }
            WriteCommand::DelMatching { pattern } => {
                self.strings.retain(|key, _| !key_matches(&pattern, key));
                self.zsets.retain(|key, _| !key_matches(&pattern, key));
            }
        }
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.lock()?.read(key))
    }

    fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        let mut inner = self.lock()?;
        Ok(keys.iter().map(|key| inner.read(key)).collect())
    }

    fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut inner = self.lock()?;

        // Purge expired entries first so they never show up in enumeration
        let expired: Vec<String> = inner
            .strings
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            inner.strings.remove(&key);
        }

        let mut matches: Vec<String> = inner
            .strings
            .keys()
            .filter(|key| key_matches(pattern, key))
            .cloned()
            .collect();
        matches.extend(
            inner
                .zsets
                .keys()
                .filter(|key| key_matches(pattern, key))
                .cloned(),
        );
        Ok(matches)
    }

    fn zrange_by_lex(
        &self,
        key: &str,
        min: &LexBound,
        max: &LexBound,
        limit: Option<usize>,
    ) -> Result<Vec<Vec<u8>>> {
        let inner = self.lock()?;
        let Some(set) = inner.zsets.get(key) else {
            return Ok(Vec::new());
        };

        let lower: Bound<&[u8]> = match min {
            LexBound::Unbounded => Bound::Unbounded,
            LexBound::Inclusive(bytes) => Bound::Included(bytes.as_slice()),
            LexBound::Exclusive(bytes) => Bound::Excluded(bytes.as_slice()),
        };
        let upper: Bound<&[u8]> = match max {
            LexBound::Unbounded => Bound::Unbounded,
            LexBound::Inclusive(bytes) => Bound::Included(bytes.as_slice()),
            LexBound::Exclusive(bytes) => Bound::Excluded(bytes.as_slice()),
        };

        let members = set.range::<[u8], _>((lower, upper)).cloned();
        Ok(match limit {
            Some(count) => members.take(count).collect(),
            None => members.collect(),
        })
    }

    fn exec(&self, batch: Vec<WriteCommand>) -> Result<()> {
        // One lock held across the whole batch: readers see all or nothing
        let mut inner = self.lock()?;
        for command in batch {
            inner.apply(command);
        }
        Ok(())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    fn set(key: &str, value: &[u8], expire_secs: Option<u64>) -> WriteCommand {
        WriteCommand::Set {
            key: key.to_string(),
            value: value.to_vec(),
            expire_secs,
        }
    }

    fn zadd(key: &str, member: &[u8]) -> WriteCommand {
        WriteCommand::ZAdd {
            key: key.to_string(),
            member: member.to_vec(),
        }
    }

    #[test]
    fn test_set_and_get() {
        let store = MemoryStore::new();

        store.exec(vec![set("k1", b"v1", None)]).unwrap();

        assert_eq!(store.get("k1").unwrap(), Some(b"v1".to_vec()));
        assert_eq!(store.get("missing").unwrap(), None);
    }

    #[test]
    fn test_overwrite_replaces_value() {
        let store = MemoryStore::new();

        store.exec(vec![set("k1", b"v1", None)]).unwrap();
        store.exec(vec![set("k1", b"v2", None)]).unwrap();

        assert_eq!(store.get("k1").unwrap(), Some(b"v2".to_vec()));
    }

    #[test]
    fn test_ttl_expiration() {
        let store = MemoryStore::new();

        store.exec(vec![set("k1", b"v1", Some(1))]).unwrap();
        assert!(store.get("k1").unwrap().is_some());

        sleep(Duration::from_millis(1100));

        assert_eq!(store.get("k1").unwrap(), None);
        assert!(store.keys("k*").unwrap().is_empty());
    }

    #[test]
    fn test_mget_preserves_positions() {
        let store = MemoryStore::new();

        store
            .exec(vec![set("a", b"1", None), set("c", b"3", None)])
            .unwrap();

        let values = store
            .mget(&["a".to_string(), "b".to_string(), "c".to_string()])
            .unwrap();
        assert_eq!(
            values,
            vec![Some(b"1".to_vec()), None, Some(b"3".to_vec())]
        );
    }

    #[test]
    fn test_keys_prefix_pattern() {
        let store = MemoryStore::new();

        store
            .exec(vec![
                set("colors:1", b"a", None),
                set("colors:2", b"b", None),
                set("other:1", b"c", None),
            ])
            .unwrap();

        let mut keys = store.keys("colors:*").unwrap();
        keys.sort();
        assert_eq!(keys, vec!["colors:1", "colors:2"]);
    }

    #[test]
    fn test_zadd_is_idempotent() {
        let store = MemoryStore::new();

        store
            .exec(vec![zadd("z", b"blue\x002"), zadd("z", b"blue\x002")])
            .unwrap();

        let members = store
            .zrange_by_lex("z", &LexBound::Unbounded, &LexBound::Unbounded, None)
            .unwrap();
        assert_eq!(members, vec![b"blue\x002".to_vec()]);
    }

    #[test]
    fn test_zrange_by_lex_bounds_and_limit() {
        let store = MemoryStore::new();

        store
            .exec(vec![
                zadd("z", b"blue\x002"),
                zadd("z", b"blue\x004"),
                zadd("z", b"cyan\x003"),
                zadd("z", b"green\x001"),
            ])
            .unwrap();

        let blues = store
            .zrange_by_lex(
                "z",
                &LexBound::Inclusive(b"blue\x00".to_vec()),
                &LexBound::Inclusive(b"blue\x00\xff".to_vec()),
                None,
            )
            .unwrap();
        assert_eq!(blues, vec![b"blue\x002".to_vec(), b"blue\x004".to_vec()]);

        let first = store
            .zrange_by_lex("z", &LexBound::Unbounded, &LexBound::Unbounded, Some(1))
            .unwrap();
        assert_eq!(first, vec![b"blue\x002".to_vec()]);

        let after_blue = store
            .zrange_by_lex(
                "z",
                &LexBound::Exclusive(b"blue\x00\xff".to_vec()),
                &LexBound::Unbounded,
                Some(1),
            )
            .unwrap();
        assert_eq!(after_blue, vec![b"cyan\x003".to_vec()]);
    }

    #[test]
    fn test_zrange_on_missing_key_is_empty() {
        let store = MemoryStore::new();

        let members = store
            .zrange_by_lex("nope", &LexBound::Unbounded, &LexBound::Unbounded, None)
            .unwrap();
        assert!(members.is_empty());
    }

    #[test]
    fn test_zrem_removes_member_and_empty_set() {
        let store = MemoryStore::new();

        store.exec(vec![zadd("z", b"blue\x002")]).unwrap();
        store
            .exec(vec![WriteCommand::ZRem {
                key: "z".to_string(),
                member: b"blue\x002".to_vec(),
            }])
            .unwrap();

        assert!(store
            .zrange_by_lex("z", &LexBound::Unbounded, &LexBound::Unbounded, None)
            .unwrap()
            .is_empty());
        assert!(store.keys("z*").unwrap().is_empty());
    }

    #[test]
    fn test_del_matching_covers_both_keyspaces() {
        let store = MemoryStore::new();

        store
            .exec(vec![
                set("colors:1", b"a", None),
                zadd("colors-index:color", b"blue\x001"),
                set("other:1", b"b", None),
            ])
            .unwrap();

        store
            .exec(vec![
                WriteCommand::DelMatching {
                    pattern: "colors:*".to_string(),
                },
                WriteCommand::DelMatching {
                    pattern: "colors-index:*".to_string(),
                },
            ])
            .unwrap();

        assert_eq!(store.get("colors:1").unwrap(), None);
        assert!(store.keys("colors-index:*").unwrap().is_empty());
        assert_eq!(store.get("other:1").unwrap(), Some(b"b".to_vec()));
    }

    #[test]
    fn test_exec_applies_whole_batch() {
        let store = MemoryStore::new();

        store
            .exec(vec![
                set("colors:1", b"a", None),
                zadd("colors-index:color", b"green\x001"),
            ])
            .unwrap();

        assert!(store.get("colors:1").unwrap().is_some());
        assert_eq!(
            store
                .zrange_by_lex(
                    "colors-index:color",
                    &LexBound::Unbounded,
                    &LexBound::Unbounded,
                    None,
                )
                .unwrap()
                .len(),
            1
        );
    }
}
