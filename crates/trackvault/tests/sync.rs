//! Privileged-attribute sync across the store and the directory.

use std::sync::Arc;

use async_trait::async_trait;
use trackvault::directory::{DirectoryOperation, InMemoryDirectory};
use trackvault::storage::inmemory::StoreOperation;
use trackvault::storage::{DynamoDbRepository, InMemoryStore, StoreError};
use trackvault::PrivilegeSynchronizer;
use trackvault_core::directory::{
    DirectoryClient, DirectoryError, Result as DirectoryResult, SyncError,
};
use trackvault_core::library::{Account, Role};
use trackvault_core::storage::AccountRepository;

type Repo = DynamoDbRepository<InMemoryStore>;

async fn seeded_repo() -> Arc<Repo> {
    let repo = Arc::new(DynamoDbRepository::new(InMemoryStore::new()));
    repo.create_account(&Account::new("root", "root@example.com", "Root").with_role(Role::Admin))
        .await
        .unwrap();
    repo.create_account(&Account::new("acc-1", "nina@example.com", "Nina"))
        .await
        .unwrap();
    repo
}

#[tokio::test]
async fn failed_group_add_rolls_the_store_back() {
    let repo = seeded_repo().await;
    let directory = InMemoryDirectory::new();
    directory.add_subject("acc-1", ["member"]).await;
    directory
        .fail_next(
            DirectoryOperation::AddToGroup,
            DirectoryError::Unavailable("connection reset".to_string()),
        )
        .await;
    let sync = PrivilegeSynchronizer::new(Arc::clone(&repo), Arc::new(directory.clone()));

    let err = sync
        .change_role("root", "acc-1", Role::Admin)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        SyncError::Directory(DirectoryError::Unavailable("connection reset".to_string()))
    );
    assert_eq!(repo.get_account("acc-1").await.unwrap().role, Role::Member);
    assert_eq!(directory.groups_of("acc-1").await.unwrap(), vec!["member"]);
}

#[tokio::test]
async fn self_modification_is_rejected_before_any_io() {
    let repo = seeded_repo().await;
    let directory = InMemoryDirectory::new();
    let sync = PrivilegeSynchronizer::new(Arc::clone(&repo), Arc::new(directory.clone()));
    let reads = repo.store().call_count(StoreOperation::GetItem).await;

    let err = sync.set_disabled("root", "root", true).await.unwrap_err();

    assert_eq!(err, SyncError::SelfModification);
    assert_eq!(repo.store().call_count(StoreOperation::GetItem).await, reads);
    assert_eq!(repo.store().call_count(StoreOperation::UpdateItem).await, 0);
    assert!(directory.calls().await.is_empty());
}

/// What happens between the store write and the failing group add.
enum Interleaving {
    /// The store starts throttling writes.
    StoreThrottles(InMemoryStore),
    /// Another writer changes the role.
    RoleChanged(Arc<Repo>, Role),
}

/// Directory whose group add always fails, after running an interleaving
/// that failure injection alone cannot reproduce.
struct InterleavedDirectory {
    inner: InMemoryDirectory,
    interleaving: Interleaving,
}

#[async_trait]
impl DirectoryClient for InterleavedDirectory {
    async fn get_groups(&self, subject: &str) -> DirectoryResult<Vec<String>> {
        self.inner.get_groups(subject).await
    }

    async fn add_to_group(&self, _subject: &str, _group: &str) -> DirectoryResult<()> {
        match &self.interleaving {
            Interleaving::StoreThrottles(store) => {
                store
                    .fail_next(
                        StoreOperation::UpdateItem,
                        StoreError::Throttled("rate exceeded".to_string()),
                    )
                    .await;
            }
            Interleaving::RoleChanged(repo, role) => {
                repo.set_role("acc-1", *role, None).await.unwrap();
            }
        }
        Err(DirectoryError::Unavailable("timeout".to_string()))
    }

    async fn remove_from_group(&self, subject: &str, group: &str) -> DirectoryResult<()> {
        self.inner.remove_from_group(subject, group).await
    }

    async fn is_enabled(&self, subject: &str) -> DirectoryResult<bool> {
        self.inner.is_enabled(subject).await
    }

    async fn enable(&self, subject: &str) -> DirectoryResult<()> {
        self.inner.enable(subject).await
    }

    async fn disable(&self, subject: &str) -> DirectoryResult<()> {
        self.inner.disable(subject).await
    }
}

async fn interleaved(interleaving: Interleaving) -> Arc<InterleavedDirectory> {
    let inner = InMemoryDirectory::new();
    inner.add_subject("acc-1", ["member"]).await;
    Arc::new(InterleavedDirectory {
        inner,
        interleaving,
    })
}

#[tokio::test]
async fn failed_store_restore_is_inconsistent() {
    let repo = seeded_repo().await;
    let directory = interleaved(Interleaving::StoreThrottles(repo.store().clone())).await;
    let sync = PrivilegeSynchronizer::new(Arc::clone(&repo), directory);

    let err = sync
        .change_role("root", "acc-1", Role::Creator)
        .await
        .unwrap_err();

    match err {
        SyncError::Inconsistent {
            subject,
            cause,
            compensation,
        } => {
            assert_eq!(subject, "acc-1");
            assert_eq!(cause, DirectoryError::Unavailable("timeout".to_string()));
            assert!(compensation.starts_with("store restore"), "{compensation}");
        }
        other => panic!("expected Inconsistent, got {other:?}"),
    }
    // The store still holds the value the directory never received.
    assert_eq!(repo.get_account("acc-1").await.unwrap().role, Role::Creator);
}

#[tokio::test]
async fn concurrent_change_is_not_overwritten_by_compensation() {
    let repo = seeded_repo().await;
    let directory = interleaved(Interleaving::RoleChanged(Arc::clone(&repo), Role::Guest)).await;
    let sync = PrivilegeSynchronizer::new(Arc::clone(&repo), directory);

    let err = sync
        .change_role("root", "acc-1", Role::Creator)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Directory(_)));
    assert_eq!(repo.get_account("acc-1").await.unwrap().role, Role::Guest);
}
