//! Property-Based Tests for the Cache Module
//!
//! Uses proptest to verify the core correctness properties: round-trip
//! storage, index/record agreement under arbitrary overwrite sequences,
//! and equality-lookup consistency with a model.

use proptest::prelude::*;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cache::IndexedCache;
use crate::store::{LexBound, MemoryStore, Store};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Rec {
    id: u32,
    color: String,
}

// == Strategies ==
/// Generates separator-free index values
fn color_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,6}"
}

/// Generates (id, value) put sequences with deliberate id collisions
fn put_sequence_strategy() -> impl Strategy<Value = Vec<(u32, String)>> {
    prop::collection::vec((0u32..20, color_strategy()), 1..40)
}

fn cache_for(store: &MemoryStore) -> IndexedCache<Rec, &MemoryStore> {
    IndexedCache::new(store, "props", |rec: &Rec| rec.id.to_string())
        .with_index("color", |rec: &Rec| rec.color.clone())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // A put followed by a find of the same id returns an equal record.
    #[test]
    fn prop_roundtrip_storage(id in 0u32..1000, color in color_strategy()) {
        let store = MemoryStore::new();
        let cache = cache_for(&store);

        let rec = Rec { id, color };
        cache.put(&rec).unwrap();

        prop_assert_eq!(cache.find(&id.to_string()).unwrap(), Some(rec));
    }

    // After any overwrite sequence, every live record has exactly one
    // index member, carrying its current value: no orphaned members, no
    // missing ones.
    #[test]
    fn prop_index_agrees_with_records(puts in put_sequence_strategy()) {
        let store = MemoryStore::new();
        let cache = cache_for(&store);

        let mut model: BTreeMap<u32, String> = BTreeMap::new();
        for (id, color) in puts {
            cache.put(&Rec { id, color: color.clone() }).unwrap();
            model.insert(id, color);
        }

        let members = store
            .zrange_by_lex("props-index:color", &LexBound::Unbounded, &LexBound::Unbounded, None)
            .unwrap();
        prop_assert_eq!(members.len(), model.len(), "one member per live record");
        for (id, color) in &model {
            let expected = format!("{color}\x00{id}").into_bytes();
            prop_assert!(members.contains(&expected), "missing member for id {}", id);
        }
    }

    // An equality lookup returns exactly the records holding that value,
    // ordered by id in byte-string order.
    #[test]
    fn prop_find_by_agrees_with_model(puts in put_sequence_strategy()) {
        let store = MemoryStore::new();
        let cache = cache_for(&store);

        let mut model: BTreeMap<u32, String> = BTreeMap::new();
        for (id, color) in puts {
            cache.put(&Rec { id, color: color.clone() }).unwrap();
            model.insert(id, color);
        }

        let colors: Vec<String> = model.values().cloned().collect();
        for color in colors {
            let mut expected: Vec<String> = model
                .iter()
                .filter(|(_, value)| **value == color)
                .map(|(id, _)| id.to_string())
                .collect();
            expected.sort();

            let got: Vec<String> = cache
                .find_by("color", &color)
                .unwrap()
                .into_iter()
                .map(|rec| rec.id.to_string())
                .collect();
            prop_assert_eq!(got, expected);
        }
    }

    // Flushing empties the namespace regardless of what was written.
    #[test]
    fn prop_flush_empties_namespace(puts in put_sequence_strategy()) {
        let store = MemoryStore::new();
        let cache = cache_for(&store);

        for (id, color) in puts {
            cache.put(&Rec { id, color }).unwrap();
        }
        cache.flush().unwrap();

        prop_assert!(cache.all().unwrap().is_empty());
        prop_assert!(store.keys("props:*").unwrap().is_empty());
        prop_assert!(store.keys("props-index:*").unwrap().is_empty());
    }
}
