//! Group Iteration Module
//!
//! Pull-based enumeration of a secondary index's groups in ascending value
//! order, one store round trip per group boundary.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::cache::keys::KeyScheme;
use crate::cache::IndexedCache;
use crate::error::Result;
use crate::store::{LexBound, Store};

// == Groups Iterator ==
/// Iterator over `(value, records)` groups of one secondary index.
///
/// Each step scans for the first member whose value sorts strictly after
/// the cursor (limit 1), names the next group from it, and yields that
/// group's records via an equality lookup. State is just the cursor, so the
/// iteration restarts only from scratch.
///
/// Not safe under concurrent mutation of the index: members added or
/// removed between steps can cause a group to be skipped or revisited.
/// That is a documented contract of the scheme, not a defect.
pub struct Groups<'a, T, S> {
    cache: &'a IndexedCache<T, S>,
    index_name: String,
    index_key: String,
    /// Value of the last yielded group; empty before the first step
    cursor: String,
    done: bool,
}

impl<'a, T, S> Groups<'a, T, S>
where
    T: Serialize + DeserializeOwned,
    S: Store,
{
    pub(crate) fn new(cache: &'a IndexedCache<T, S>, index_name: &str) -> Self {
        Self {
            cache,
            index_name: index_name.to_string(),
            index_key: cache.scheme().index_key(index_name),
            cursor: String::new(),
            done: false,
        }
    }

    /// Finds the value of the first group after the cursor, if any.
    fn next_group(&self) -> Result<Option<String>> {
        let min = KeyScheme::group_advance(&self.cursor);
        let members =
            self.cache
                .store()
                .zrange_by_lex(&self.index_key, &min, &LexBound::Unbounded, Some(1))?;
        let Some(member) = members.into_iter().next() else {
            return Ok(None);
        };

        let value = KeyScheme::split_member(&member)
            .and_then(|(value, _)| std::str::from_utf8(value).ok());
        match value {
            Some(value) => Ok(Some(value.to_string())),
            None => {
                // Only well-formed members are ever written; a malformed one
                // means foreign data under this key, which cannot name a
                // group or advance the cursor.
                warn!(key = %self.index_key, "malformed index member, stopping group iteration");
                Ok(None)
            }
        }
    }
}

impl<T, S> Iterator for Groups<'_, T, S>
where
    T: Serialize + DeserializeOwned,
    S: Store,
{
    type Item = Result<(String, Vec<T>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let value = match self.next_group() {
            Ok(Some(value)) => value,
            Ok(None) => {
                self.done = true;
                return None;
            }
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };

        self.cursor = value.clone();
        match self.cache.find_by(&self.index_name, &value) {
            Ok(records) => Some(Ok((value, records))),
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
