//! Concurrent counter updates converge to the sum of their deltas.

use std::sync::Arc;

use proptest::prelude::*;
use trackvault::storage::{DynamoDbRepository, InMemoryStore};
use trackvault_core::library::{Collection, Tag};
use trackvault_core::storage::{
    CollectionRepository, CounterRepository, CounterTarget, RepositoryError, TagRepository,
};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn concurrent_increments_converge(deltas in prop::collection::vec(prop_oneof![Just(1i64), Just(-1i64)], 0..64)) {
        let expected: i64 = deltas.iter().sum();

        let (returned, stored) = runtime().block_on(async {
            let repo = Arc::new(DynamoDbRepository::new(InMemoryStore::new()));
            repo.create_tag(&Tag::new("acc-1", "rock")).await.unwrap();
            let target = CounterTarget::TagItems {
                owner_id: "acc-1".to_string(),
                tag_name: "rock".to_string(),
            };

            let handles: Vec<_> = deltas
                .iter()
                .map(|&delta| {
                    let repo = Arc::clone(&repo);
                    let target = target.clone();
                    tokio::spawn(async move { repo.increment(&target, delta).await })
                })
                .collect();

            let mut returned = Vec::new();
            for handle in handles {
                returned.push(handle.await.unwrap().unwrap());
            }
            let stored = repo.get_tag("acc-1", "rock").await.unwrap().item_count;
            (returned, stored)
        });

        prop_assert_eq!(stored, expected);
        // With only increments, every caller saw a distinct value.
        if deltas.iter().all(|&d| d > 0) {
            let mut sorted = returned;
            sorted.sort_unstable();
            prop_assert_eq!(sorted, (1..=expected).collect::<Vec<_>>());
        }
    }
}

#[tokio::test]
async fn collection_aggregates_follow_membership() {
    let repo = DynamoDbRepository::new(InMemoryStore::new());
    repo.create_collection(&Collection::new("acc-1", "Blue").with_id("blue"))
        .await
        .unwrap();
    let items = CounterTarget::CollectionItems {
        owner_id: "acc-1".to_string(),
        collection_id: "blue".to_string(),
    };
    let duration = CounterTarget::CollectionDuration {
        owner_id: "acc-1".to_string(),
        collection_id: "blue".to_string(),
    };

    for secs in [201, 187, 342] {
        repo.increment(&items, 1).await.unwrap();
        repo.increment(&duration, secs).await.unwrap();
    }
    repo.increment(&items, -1).await.unwrap();
    repo.increment(&duration, -187).await.unwrap();

    let collection = repo.get_collection("acc-1", "blue").await.unwrap();
    assert_eq!(collection.item_count, 2);
    assert_eq!(collection.total_duration_secs, 543);
}

#[tokio::test]
async fn counter_on_deleted_parent_does_not_resurrect_it() {
    let repo = DynamoDbRepository::new(InMemoryStore::new());
    let err = repo
        .increment(
            &CounterTarget::ListItems {
                owner_id: "acc-1".to_string(),
                list_id: "gone".to_string(),
            },
            1,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, RepositoryError::NotFound { .. }));
    assert!(repo.store().is_empty().await);
}
