//! Indexed Cache Module
//!
//! The cache engine: writes records together with their secondary-index
//! members as one atomic unit, and resolves point, equality, and
//! full-namespace lookups against the backing store.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::cache::groups::Groups;
use crate::cache::keys::KeyScheme;
use crate::error::{CacheError, Result};
use crate::store::{LexBound, Store, WriteCommand};

// == Extractor Types ==
/// Derives a record's primary id. Must be pure and deterministic.
pub type PrimaryKeyFn<T> = Box<dyn Fn(&T) -> String + Send + Sync>;

/// Derives one secondary-index value from a record. Must be deterministic.
pub type IndexValueFn<T> = Box<dyn Fn(&T) -> String + Send + Sync>;

/// Fallback invoked on a point-lookup miss; a returned record is written
/// through into the cache.
pub type MissResolver<T> = Box<dyn Fn(&str) -> Option<T> + Send + Sync>;

// == Indexed Cache ==
/// An indexed object cache over a sorted-set capable key-value store.
///
/// One instance caches one record type `T` under one namespace. Besides the
/// primary entry per record, it maintains a named secondary index per
/// configured extractor, enabling equality lookup ([`find_by`]), grouped
/// iteration ([`group_by`]), and ordered enumeration ([`all`]).
///
/// The cache holds no mutable state of its own; it is safe to share across
/// threads (all coordination is delegated to the store's atomic batches).
///
/// [`find_by`]: IndexedCache::find_by
/// [`group_by`]: IndexedCache::group_by
/// [`all`]: IndexedCache::all
pub struct IndexedCache<T, S> {
    store: S,
    scheme: KeyScheme,
    primary: PrimaryKeyFn<T>,
    indexes: BTreeMap<String, IndexValueFn<T>>,
    ttl: Option<Duration>,
    on_miss: Option<MissResolver<T>>,
}

impl<T, S> IndexedCache<T, S>
where
    T: Serialize + DeserializeOwned,
    S: Store,
{
    // == Constructor ==
    /// Creates a cache over `store` scoped to `namespace`.
    ///
    /// # Arguments
    /// * `store` - Backing store handle (injected, never ambient)
    /// * `namespace` - Store-wide unique prefix for this cache's keys
    /// * `primary` - Pure function deriving a record's primary id
    pub fn new(
        store: S,
        namespace: impl Into<String>,
        primary: impl Fn(&T) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            store,
            scheme: KeyScheme::new(namespace),
            primary: Box::new(primary),
            indexes: BTreeMap::new(),
            ttl: None,
            on_miss: None,
        }
    }

    // == Configuration ==
    /// Adds a named secondary index fed by `extract`.
    ///
    /// Extracted values must never contain the separator byte (`0x00`);
    /// `put` rejects offending records before writing anything.
    pub fn with_index(
        mut self,
        name: impl Into<String>,
        extract: impl Fn(&T) -> String + Send + Sync + 'static,
    ) -> Self {
        self.indexes.insert(name.into(), Box::new(extract));
        self
    }

    /// Applies a time-to-live to every future primary write.
    ///
    /// The expiry covers primary entries only; index members persist until
    /// overwritten or flushed. Store expiry has seconds granularity, so
    /// sub-second durations round up to one second.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Installs the fallback used by [`find`](IndexedCache::find) on a miss.
    pub fn with_on_miss(
        mut self,
        resolve: impl Fn(&str) -> Option<T> + Send + Sync + 'static,
    ) -> Self {
        self.on_miss = Some(Box::new(resolve));
        self
    }

    /// The key scheme in effect for this cache.
    pub fn scheme(&self) -> &KeyScheme {
        &self.scheme
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    // == Put ==
    /// Writes `record`'s primary entry and every secondary-index member as
    /// one atomic unit.
    ///
    /// Re-putting an id whose secondary values changed removes the stale
    /// composite members in the same unit, so readers never observe a
    /// record with dangling or missing index members.
    pub fn put(&self, record: &T) -> Result<&Self> {
        let id = (self.primary)(record);
        let primary_key = self.scheme.primary_key(&id);

        // Encode every new member up front: a separator violation must fail
        // the put before any write reaches the store.
        let mut new_values: BTreeMap<&str, String> = BTreeMap::new();
        let mut additions = Vec::with_capacity(self.indexes.len());
        for (name, extract) in &self.indexes {
            let value = extract(record);
            let member = self.scheme.encode_member(name, &value, &id)?;
            additions.push(WriteCommand::ZAdd {
                key: self.scheme.index_key(name),
                member,
            });
            new_values.insert(name.as_str(), value);
        }

        let payload = serde_json::to_vec(record).map_err(|source| CacheError::Serialization {
            key: primary_key.clone(),
            source,
        })?;

        let mut batch = self.stale_members(&id, &new_values)?;
        batch.push(WriteCommand::Set {
            key: primary_key,
            value: payload,
            expire_secs: self.ttl.map(expire_secs),
        });
        batch.extend(additions);

        self.store.exec(batch)?;
        debug!(namespace = %self.scheme.namespace(), id = %id, "record cached");
        Ok(self)
    }

    /// Collects removals for index members left over from a previous record
    /// under the same id.
    ///
    /// Diffs against the previous payload when it decodes; otherwise falls
    /// back to rescanning each index for members carrying the id.
    fn stale_members(
        &self,
        id: &str,
        new_values: &BTreeMap<&str, String>,
    ) -> Result<Vec<WriteCommand>> {
        let Some(bytes) = self.store.get(&self.scheme.primary_key(id))? else {
            // With a TTL the previous entry may have expired while its
            // index members live on; those must still be cleared or an
            // equality lookup on the old value would return this id.
            if self.ttl.is_some() {
                return self.rescan_members(id);
            }
            return Ok(Vec::new());
        };

        let previous: T = match serde_json::from_slice(&bytes) {
            Ok(previous) => previous,
            Err(_) => {
                warn!(
                    namespace = %self.scheme.namespace(),
                    id = %id,
                    "previous payload does not decode, rescanning indexes for stale members"
                );
                return self.rescan_members(id);
            }
        };

        let mut removals = Vec::new();
        for (name, extract) in &self.indexes {
            let old_value = extract(&previous);
            if new_values.get(name.as_str()) == Some(&old_value) {
                continue;
            }
            // The old value passed the separator check when it was written
            if let Ok(member) = self.scheme.encode_member(name, &old_value, id) {
                removals.push(WriteCommand::ZRem {
                    key: self.scheme.index_key(name),
                    member,
                });
            }
        }
        Ok(removals)
    }

    /// Full per-index scan for members carrying `id`; used when the
    /// previous payload cannot be decoded for a diff.
    fn rescan_members(&self, id: &str) -> Result<Vec<WriteCommand>> {
        let mut removals = Vec::new();
        for name in self.indexes.keys() {
            let key = self.scheme.index_key(name);
            let members =
                self.store
                    .zrange_by_lex(&key, &LexBound::Unbounded, &LexBound::Unbounded, None)?;
            for member in members {
                if KeyScheme::member_id(&member) == Some(id) {
                    removals.push(WriteCommand::ZRem {
                        key: key.clone(),
                        member,
                    });
                }
            }
        }
        Ok(removals)
    }

    // == Find ==
    /// Point lookup by primary id.
    ///
    /// On a miss with a configured resolver, the resolver's record is
    /// written through and returned. Two concurrent lookups of the same
    /// absent id may both invoke the resolver; the core does not
    /// deduplicate in-flight misses.
    ///
    /// A primary entry whose payload does not decode surfaces as
    /// [`CacheError::Deserialization`], never as a miss.
    pub fn find(&self, id: &str) -> Result<Option<T>> {
        let key = self.scheme.primary_key(id);
        if let Some(bytes) = self.store.get(&key)? {
            trace!(key = %key, "cache hit");
            return self.decode(&key, &bytes).map(Some);
        }

        let Some(resolve) = &self.on_miss else {
            trace!(key = %key, "cache miss, no resolver");
            return Ok(None);
        };
        match resolve(id) {
            Some(record) => {
                debug!(namespace = %self.scheme.namespace(), id = %id, "miss resolved, writing through");
                self.put(&record)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    // == Find By ==
    /// Equality lookup over a named secondary index.
    ///
    /// Returns every record whose extracted value equals `value`, ordered
    /// by id in byte-string order (so id "10" sorts before id "2"). That
    /// ordering is a contractual property of the member encoding.
    pub fn find_by(&self, index_name: &str, value: &str) -> Result<Vec<T>> {
        let index_key = self.scheme.index_key(index_name);
        let (min, max) = KeyScheme::value_bounds(value);
        let members = self.store.zrange_by_lex(&index_key, &min, &max, None)?;

        let keys: Vec<String> = members
            .iter()
            .filter_map(|member| KeyScheme::member_id(member))
            .map(|id| self.scheme.primary_key(id))
            .collect();
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        self.hydrate(&keys)
    }

    // == Group By ==
    /// Lazy, single-pass enumeration of a secondary index's groups in
    /// ascending value order.
    ///
    /// Each step yields `(value, records)` where `records` equals
    /// [`find_by`](IndexedCache::find_by) for that value. The iterator is
    /// restartable only from scratch (call `group_by` again) and is not
    /// safe under concurrent mutation of the index: members added or
    /// removed between steps can cause a group to be skipped or revisited.
    pub fn group_by<'a>(&'a self, index_name: &str) -> Groups<'a, T, S> {
        Groups::new(self, index_name)
    }

    // == All ==
    /// Enumerates every record in the namespace, ordered by primary key in
    /// byte-string order. An empty namespace yields an empty Vec.
    pub fn all(&self) -> Result<Vec<T>> {
        let mut keys = self.store.keys(&self.scheme.primary_pattern())?;
        keys.sort();
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        self.hydrate(&keys)
    }

    // == Flush ==
    /// Atomically deletes every primary entry and every secondary index in
    /// the namespace.
    pub fn flush(&self) -> Result<()> {
        self.store.exec(vec![
            WriteCommand::DelMatching {
                pattern: self.scheme.primary_pattern(),
            },
            WriteCommand::DelMatching {
                pattern: self.scheme.index_pattern(),
            },
        ])?;
        debug!(namespace = %self.scheme.namespace(), "namespace flushed");
        Ok(())
    }

    // == Warm ==
    /// Puts every record of `records` in input order, optionally flushing
    /// the namespace first.
    ///
    /// The batch is not atomic: a failure partway through surfaces as
    /// [`CacheError::PartialWarm`] with the number of records already
    /// committed, and the committed prefix stays in the cache.
    pub fn warm<I>(&self, records: I, flush: bool) -> Result<&Self>
    where
        I: IntoIterator<Item = T>,
    {
        if flush {
            self.flush()?;
        }

        let mut committed = 0;
        for record in records {
            self.put(&record).map_err(|source| CacheError::PartialWarm {
                committed,
                source: Box::new(source),
            })?;
            committed += 1;
        }
        debug!(namespace = %self.scheme.namespace(), records = committed, "cache warmed");
        Ok(self)
    }

    // == Internal Helpers ==
    /// Batch-reads `keys` and decodes every present payload, preserving
    /// key order. Keys whose primary entry is gone (the TTL covers
    /// primaries only, so an index member can outlive its record) are
    /// skipped rather than failing the lookup.
    fn hydrate(&self, keys: &[String]) -> Result<Vec<T>> {
        let rows = self.store.mget(keys)?;
        let mut records = Vec::with_capacity(rows.len());
        for (key, row) in keys.iter().zip(rows) {
            if let Some(bytes) = row {
                records.push(self.decode(key, &bytes)?);
            }
        }
        Ok(records)
    }

    fn decode(&self, key: &str, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|source| CacheError::Deserialization {
            key: key.to_string(),
            source,
        })
    }
}

// == Utility Functions ==
/// Converts a TTL to whole seconds, rounding up so a sub-second duration
/// never becomes an already-expired write.
fn expire_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs.max(1)
    }
}
