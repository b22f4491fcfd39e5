//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check eviction ordering and classification purity.

use proptest::prelude::*;
use std::sync::Arc;
use url::Url;

use crate::cache::strategy::{classify, is_cache_first_candidate, is_network_first_candidate};
use crate::cache::{
    compute_cache_size, AssetMatch, CacheStorage, EntryIndex, LruEvictor, ManualClock,
    MemoryCacheStorage, Request, Response, Strategy as FetchStrategy,
};
use crate::storage::{Database, DatabaseSchema, MemoryBackend};

const CACHE: &str = "runtime-v1";

// == Strategies ==
/// Generates (size, last_accessed) pairs for cache entries
fn entries_strategy() -> impl Strategy<Value = Vec<(u64, i64)>> {
    prop::collection::vec((1u64..2048, 0i64..20), 1..30)
}

/// Generates URL paths mixing assets, API routes and pages
fn path_strategy() -> impl Strategy<Value = String> {
    (
        prop::collection::vec("[a-z]{1,8}", 0..4),
        prop::option::of(prop_oneof![
            Just("js"),
            Just("css"),
            Just("png"),
            Just("json"),
            Just("html"),
            Just("woff2"),
        ]),
        any::<bool>(),
    )
        .prop_map(|(segments, ext, api)| {
            let mut path = String::new();
            if api {
                path.push_str("/api");
            }
            for segment in segments {
                path.push('/');
                path.push_str(&segment);
            }
            if let Some(ext) = ext {
                path.push_str("/file.");
                path.push_str(ext);
            }
            if path.is_empty() {
                path.push('/');
            }
            path
        })
}

/// Seeds a cache and returns the evictor plus the expected eviction order
async fn seeded(entries: &[(u64, i64)]) -> (Arc<MemoryCacheStorage>, LruEvictor, Vec<String>) {
    let db = Database::open(Arc::new(MemoryBackend::new()), DatabaseSchema::default())
        .await
        .unwrap();
    let clock = Arc::new(ManualClock::new(0));
    let storage = Arc::new(MemoryCacheStorage::new());
    let index = EntryIndex::new(db, clock.clone());

    for (i, (size, at)) in entries.iter().enumerate() {
        let key = format!("entry-{}", i);
        let response = Response::new(200, vec![0u8; *size as usize]);
        clock.set(*at);
        storage.put(CACHE, &key, response.clone()).await.unwrap();
        index.record(CACHE, &key, &response).await.unwrap();
    }

    let mut order: Vec<(i64, usize)> = entries
        .iter()
        .enumerate()
        .map(|(i, (_, at))| (*at, i))
        .collect();
    order.sort();
    let expected = order.into_iter().map(|(_, i)| format!("entry-{}", i)).collect();

    (storage.clone(), LruEvictor::new(storage, index), expected)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Eviction removes exactly the oldest prefix, ends within budget and
    // stops as soon as the budget is met.
    #[test]
    fn prop_lru_removes_minimal_oldest_prefix(
        entries in entries_strategy(),
        budget_ratio in 0.0f64..1.2,
    ) {
        let total: u64 = entries.iter().map(|(size, _)| size).sum();
        let budget = (total as f64 * budget_ratio) as u64;

        let (storage, remaining, expected) = tokio_test::block_on(async {
            let (storage, evictor, expected) = seeded(&entries).await;
            evictor.evict_to_fit(CACHE, budget).await.unwrap();
            let remaining = compute_cache_size(storage.as_ref(), CACHE).await.unwrap();
            (storage, remaining, expected)
        });
        let kept = tokio_test::block_on(storage.keys(CACHE)).unwrap();

        prop_assert!(remaining <= budget, "cache left over budget");

        let removed: Vec<&String> = expected.iter().filter(|k| !kept.contains(*k)).collect();
        let prefix: Vec<&String> = expected.iter().take(removed.len()).collect();
        prop_assert_eq!(&removed, &prefix, "evicted entries are not the oldest");

        if let Some(last) = removed.last() {
            let idx: usize = last.trim_start_matches("entry-").parse().unwrap();
            prop_assert!(
                remaining + entries[idx].0 > budget,
                "evicted one entry more than necessary"
            );
        }
    }

    // Within budget, nothing is evicted.
    #[test]
    fn prop_lru_vacuous_when_within_budget(entries in entries_strategy(), slack in 0u64..100) {
        let total: u64 = entries.iter().map(|(size, _)| size).sum();

        let evicted = tokio_test::block_on(async {
            let (_, evictor, _) = seeded(&entries).await;
            evictor.evict_to_fit(CACHE, total + slack).await.unwrap()
        });
        prop_assert_eq!(evicted, 0);
    }

    // Classification is pure and falls through when neither set matches.
    #[test]
    fn prop_classification_is_deterministic(path in path_strategy()) {
        let url = Url::parse(&format!("http://localhost{}", path)).unwrap();
        let request = Request::get(url);

        for mode in [AssetMatch::Suffix, AssetMatch::Substring] {
            let first = classify(&request, mode);
            prop_assert_eq!(first, classify(&request, mode));

            let cache_first = is_cache_first_candidate(&request, mode);
            let network_first = is_network_first_candidate(&request);
            prop_assert_eq!(cache_first, is_cache_first_candidate(&request, mode));
            prop_assert_eq!(
                first == FetchStrategy::PassThrough,
                !cache_first && !network_first
            );
        }
    }
}
