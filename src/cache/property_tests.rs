//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check store and wrapper behavior over generated inputs.

use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::thread::sleep;
use std::time::Duration;

use crate::cache::{CacheBackend, CacheStore, Invalidator, SharedCache};

// == Test Configuration ==
const TEST_TTL: u64 = 300;

// == Strategies ==
/// Generates valid cache keys (non-empty, within length limit)
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,3}_[a-zA-Z0-9]{1,16}".prop_map(|s| s)
}

/// Generates cache values
fn valid_value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,128}".prop_map(|s| s)
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: String },
    Get { key: String },
    Delete { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (valid_key_strategy(), valid_value_strategy())
            .prop_map(|(key, value)| CacheOp::Set { key, value }),
        valid_key_strategy().prop_map(|key| CacheOp::Get { key }),
        valid_key_strategy().prop_map(|key| CacheOp::Delete { key }),
    ]
}

/// Same operations over a handful of keys, so reads often hit.
fn pooled_op_strategy() -> impl Strategy<Value = CacheOp> {
    let key = || prop::sample::select(vec!["p_1", "p_2", "q_1", "q_2"]).prop_map(String::from);
    prop_oneof![
        (key(), valid_value_strategy()).prop_map(|(key, value)| CacheOp::Set { key, value }),
        key().prop_map(|key| CacheOp::Get { key }),
        key().prop_map(|key| CacheOp::Delete { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // **Property: statistics accuracy**
    // Hits and misses reported by the store match a model of which keys are present.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(pooled_op_strategy(), 1..50)) {
        let mut store = CacheStore::new();
        let mut model: BTreeMap<String, String> = BTreeMap::new();
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    store.set(&key, value.clone(), TEST_TTL).unwrap();
                    model.insert(key, value);
                }
                CacheOp::Get { key } => {
                    let expected = model.get(&key).cloned();
                    if expected.is_some() {
                        expected_hits += 1;
                    } else {
                        expected_misses += 1;
                    }
                    prop_assert_eq!(store.get(&key), expected, "Value mismatch for {}", key);
                }
                CacheOp::Delete { key } => {
                    prop_assert_eq!(store.delete(&key), model.remove(&key).is_some());
                }
            }
        }

        let stats = store.stats();
        prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
        prop_assert_eq!(stats.total_entries, model.len(), "Total entries mismatch");
    }

    // **Property: round trip**
    // A value read back before its TTL elapses is exactly the value stored.
    #[test]
    fn prop_roundtrip_storage(key in valid_key_strategy(), value in valid_value_strategy()) {
        let mut store = CacheStore::new();

        store.set(&key, value.clone(), TEST_TTL).unwrap();

        prop_assert!(store.has(&key));
        prop_assert_eq!(store.get(&key), Some(value));
    }

    // **Property: overwrite semantics**
    #[test]
    fn prop_overwrite_semantics(
        key in valid_key_strategy(),
        value1 in valid_value_strategy(),
        value2 in valid_value_strategy()
    ) {
        let mut store = CacheStore::new();

        store.set(&key, value1, TEST_TTL).unwrap();
        store.set(&key, value2.clone(), TEST_TTL).unwrap();

        prop_assert_eq!(store.get(&key), Some(value2));
        prop_assert_eq!(store.len(), 1, "Should have exactly one entry after overwrite");
    }

    // **Property: keys mirror a model set**
    // After any sequence of operations, `keys()` equals the set a plain model would hold.
    #[test]
    fn prop_keys_match_model(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        let mut store = CacheStore::new();
        let mut model: BTreeSet<String> = BTreeSet::new();

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    store.set(&key, value, TEST_TTL).unwrap();
                    model.insert(key);
                }
                CacheOp::Get { key } => {
                    prop_assert_eq!(store.get(&key).is_some(), model.contains(&key));
                }
                CacheOp::Delete { key } => {
                    prop_assert_eq!(store.delete(&key), model.remove(&key));
                }
            }
        }

        prop_assert_eq!(store.keys(), model.into_iter().collect::<Vec<_>>());
    }

    // **Property: prefix invalidation is exact**
    // Exactly the keys starting with the prefix go; every other key stays.
    #[test]
    fn prop_prefix_invalidation_exact(
        keys in prop::collection::btree_set(valid_key_strategy(), 1..40),
        prefix in "[a-z]{1,2}_?"
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();

        rt.block_on(async {
            let cache = SharedCache::new();
            for key in &keys {
                cache.set(key, "v".to_string(), TEST_TTL).await.unwrap();
            }

            let invalidator: Invalidator<()> = Invalidator::builder("prop")
                .cache(cache.backend())
                .by_prefix(prefix.clone())
                .build()
                .unwrap();
            let removed = invalidator.invalidate(&()).await;

            let expected: Vec<String> = keys
                .iter()
                .filter(|k| !k.starts_with(&prefix))
                .cloned()
                .collect();

            prop_assert_eq!(removed, keys.len() - expected.len());
            prop_assert_eq!(cache.keys().await.unwrap(), expected);
            Ok(())
        })?;
    }

    // **Property: concurrent access stays consistent**
    // Interleaved tasks on one shared handle never observe a value that was never written.
    #[test]
    fn prop_concurrent_operation_correctness(
        operations in prop::collection::vec(cache_op_strategy(), 10..50)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();

        rt.block_on(async {
            let cache = SharedCache::new();
            let written: BTreeSet<String> = operations
                .iter()
                .filter_map(|op| match op {
                    CacheOp::Set { value, .. } => Some(value.clone()),
                    _ => None,
                })
                .collect();

            let mut handles = vec![];
            for op in operations {
                let cache = cache.clone();
                handles.push(tokio::spawn(async move {
                    match op {
                        CacheOp::Set { key, value } => {
                            cache.set(&key, value, TEST_TTL).await.unwrap();
                            None
                        }
                        CacheOp::Get { key } => cache.get(&key).await.unwrap(),
                        CacheOp::Delete { key } => {
                            cache.delete(&key).await.unwrap();
                            None
                        }
                    }
                }));
            }

            for handle in handles {
                let observed = handle.await.expect("Task should not panic");
                if let Some(value) = observed {
                    prop_assert!(written.contains(&value), "Read a value nobody wrote: {}", value);
                }
            }
            Ok(())
        })?;
    }
}

// Separate proptest block with fewer cases for time-sensitive TTL tests
proptest! {
    #![proptest_config(ProptestConfig::with_cases(5))]

    // **Property: TTL expiration**
    // Once the TTL has elapsed, the entry is a miss.
    #[test]
    fn prop_ttl_expiration_behavior(
        key in valid_key_strategy(),
        value in valid_value_strategy()
    ) {
        let mut store = CacheStore::new();

        store.set(&key, value.clone(), 1).unwrap();
        prop_assert_eq!(store.get(&key), Some(value), "Value should match before expiration");

        sleep(Duration::from_millis(1100));

        prop_assert!(store.get(&key).is_none(), "Entry should not be found after TTL expires");
    }
}
