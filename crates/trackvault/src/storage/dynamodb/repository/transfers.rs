use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::Utc;
use trackvault_core::library::{
    validate_identifier, validate_transition, EntityKind, TransferJob, TransferOutcome,
    TransferStatus,
};
use trackvault_core::storage::{DeleteMode, ListOptions, Page, Result, TransferRepository};

use super::super::conversions::{
    StoredEntity, ATTR_COMPLETED_AT, ATTR_ERROR_MESSAGE, ATTR_ITEM_ID, ATTR_STATUS,
    ATTR_UPDATED_AT,
};
use super::super::keys;
use super::super::store::{Condition, Index, ItemStore, StoreError, Update, GSI1PK, GSI1SK};
use super::{conflict, not_found, timestamp, DynamoDbRepository, Listing};

fn status_value(status: TransferStatus) -> AttributeValue {
    AttributeValue::S(status.as_str().to_string())
}

#[async_trait]
impl<S: ItemStore> TransferRepository for DynamoDbRepository<S> {
    async fn create_transfer(&self, job: &TransferJob) -> Result<TransferJob> {
        self.put_new(job).await
    }

    async fn get_transfer(&self, owner_id: &str, job_id: &str) -> Result<TransferJob> {
        validate_identifier("owner_id", owner_id)?;
        validate_identifier("job_id", job_id)?;
        self.fetch(&keys::transfer_key(owner_id, job_id), job_id)
            .await
    }

    async fn update_transfer(&self, job: &TransferJob) -> Result<TransferJob> {
        self.overwrite(job).await
    }

    async fn delete_transfer(
        &self,
        owner_id: &str,
        job_id: &str,
        mode: DeleteMode,
    ) -> Result<()> {
        validate_identifier("owner_id", owner_id)?;
        validate_identifier("job_id", job_id)?;
        self.remove(
            &keys::transfer_key(owner_id, job_id),
            EntityKind::TransferJob,
            job_id,
            mode,
        )
        .await
    }

    async fn list_transfers(
        &self,
        owner_id: &str,
        options: &ListOptions,
    ) -> Result<Page<TransferJob>> {
        validate_identifier("owner_id", owner_id)?;
        let listing =
            Listing::table(keys::account_pk(owner_id)).with_prefix(keys::TRANSFER_PREFIX);
        self.query_page(&listing, options).await
    }

    async fn list_transfers_by_status(
        &self,
        status: TransferStatus,
        options: &ListOptions,
    ) -> Result<Page<TransferJob>> {
        let listing = Listing::index(Index::Gsi1, keys::transfer_status_gsi1_pk(status));
        self.query_page(&listing, options).await
    }

    async fn transition_transfer(
        &self,
        owner_id: &str,
        job_id: &str,
        from: TransferStatus,
        to: TransferStatus,
        outcome: TransferOutcome,
    ) -> Result<TransferJob> {
        validate_identifier("owner_id", owner_id)?;
        validate_identifier("job_id", job_id)?;
        validate_transition(from, to)?;

        let now = Utc::now();
        let mut updates = vec![
            Update::set(ATTR_STATUS, status_value(to)),
            Update::set(GSI1PK, AttributeValue::S(keys::transfer_status_gsi1_pk(to))),
            Update::set(
                GSI1SK,
                AttributeValue::S(keys::transfer_status_gsi1_sk(&now, job_id)),
            ),
            Update::set(ATTR_UPDATED_AT, timestamp(&now)),
        ];
        if let Some(message) = outcome.error_message {
            updates.push(Update::set(ATTR_ERROR_MESSAGE, AttributeValue::S(message)));
        }
        if let Some(item_id) = outcome.item_id {
            updates.push(Update::set(ATTR_ITEM_ID, AttributeValue::S(item_id)));
        }
        if to.is_terminal() {
            updates.push(Update::set(ATTR_COMPLETED_AT, timestamp(&now)));
        }

        let key = keys::transfer_key(owner_id, job_id);
        let condition = Condition::equals(ATTR_STATUS, status_value(from));
        match self.store.update_item(&key, updates, Some(condition)).await {
            Ok(item) => {
                tracing::debug!(job_id = %job_id, from = %from, to = %to, "Transfer transitioned");
                TransferJob::from_item(&item)
            }
            Err(StoreError::ConditionFailed) => match self.store.get_item(&key).await? {
                Some(_) => Err(conflict(EntityKind::TransferJob, job_id)),
                None => Err(not_found(EntityKind::TransferJob, job_id)),
            },
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::inmemory::InMemoryStore;
    use trackvault_core::storage::RepositoryError;

    fn repo() -> DynamoDbRepository<InMemoryStore> {
        DynamoDbRepository::new(InMemoryStore::new())
    }

    fn job(owner: &str, id: &str) -> TransferJob {
        TransferJob {
            id: id.to_string(),
            ..TransferJob::new(owner, format!("{id}.flac"), format!("uploads/{owner}/{id}.flac"))
        }
    }

    #[tokio::test]
    async fn test_transfer_crud() {
        let repo = repo();
        let created = repo.create_transfer(&job("acc-1", "job-1")).await.unwrap();
        assert_eq!(created.status, TransferStatus::Pending);
        assert_eq!(repo.get_transfer("acc-1", "job-1").await.unwrap(), created);

        let mut renamed = created.clone();
        renamed.file_name = "renamed.flac".to_string();
        renamed.status = TransferStatus::Completed;
        let updated = repo.update_transfer(&renamed).await.unwrap();
        assert_eq!(updated.file_name, "renamed.flac");
        // Status only moves through transitions.
        assert_eq!(updated.status, TransferStatus::Pending);

        repo.delete_transfer("acc-1", "job-1", DeleteMode::MustExist)
            .await
            .unwrap();
        let err = repo
            .delete_transfer("acc-1", "job-1", DeleteMode::MustExist)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_transfers_newest_first() {
        let repo = repo();
        for id in ["job-1", "job-2", "job-3"] {
            repo.create_transfer(&job("acc-1", id)).await.unwrap();
        }

        let page = repo
            .list_transfers("acc-1", &ListOptions::new().descending())
            .await
            .unwrap();
        let ids: Vec<_> = page.items.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["job-3", "job-2", "job-1"]);
    }

    #[tokio::test]
    async fn test_generated_ids_list_in_creation_order() {
        let repo = repo();
        let mut created = Vec::new();
        for i in 0..3 {
            let job = TransferJob::new("acc-1", format!("{i}.flac"), format!("uploads/{i}.flac"));
            created.push(repo.create_transfer(&job).await.unwrap().id);
        }

        let page = repo
            .list_transfers("acc-1", &ListOptions::new())
            .await
            .unwrap();
        let listed: Vec<_> = page.items.into_iter().map(|j| j.id).collect();
        assert_eq!(listed, created);
    }

    #[tokio::test]
    async fn test_transition_moves_job_between_status_partitions() {
        let repo = repo();
        repo.create_transfer(&job("acc-1", "job-1")).await.unwrap();

        let processing = repo
            .transition_transfer(
                "acc-1",
                "job-1",
                TransferStatus::Pending,
                TransferStatus::Processing,
                TransferOutcome::default(),
            )
            .await
            .unwrap();
        assert_eq!(processing.status, TransferStatus::Processing);
        assert!(processing.completed_at.is_none());

        let pending = repo
            .list_transfers_by_status(TransferStatus::Pending, &ListOptions::new())
            .await
            .unwrap();
        assert!(pending.items.is_empty());

        let completed = repo
            .transition_transfer(
                "acc-1",
                "job-1",
                TransferStatus::Processing,
                TransferStatus::Completed,
                TransferOutcome {
                    item_id: Some("t1".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(completed.item_id.as_deref(), Some("t1"));
        assert!(completed.completed_at.is_some());

        let done = repo
            .list_transfers_by_status(TransferStatus::Completed, &ListOptions::new())
            .await
            .unwrap();
        assert_eq!(done.items, vec![completed]);
    }

    #[tokio::test]
    async fn test_transition_rejects_forbidden_moves() {
        let repo = repo();
        repo.create_transfer(&job("acc-1", "job-1")).await.unwrap();

        let err = repo
            .transition_transfer(
                "acc-1",
                "job-1",
                TransferStatus::Pending,
                TransferStatus::Completed,
                TransferOutcome::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_transition_from_stale_status_conflicts() {
        let repo = repo();
        repo.create_transfer(&job("acc-1", "job-1")).await.unwrap();
        repo.transition_transfer(
            "acc-1",
            "job-1",
            TransferStatus::Pending,
            TransferStatus::Failed,
            TransferOutcome {
                error_message: Some("unsupported codec".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let err = repo
            .transition_transfer(
                "acc-1",
                "job-1",
                TransferStatus::Pending,
                TransferStatus::Processing,
                TransferOutcome::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict { .. }));

        let err = repo
            .transition_transfer(
                "acc-1",
                "ghost",
                TransferStatus::Pending,
                TransferStatus::Processing,
                TransferOutcome::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_moves_job_to_the_back_of_its_status_listing() {
        let repo = repo();
        let a = repo.create_transfer(&job("acc-1", "job-a")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let b = repo.create_transfer(&job("acc-1", "job-b")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let mut renamed = a.clone();
        renamed.file_name = "a-renamed.flac".to_string();
        let renamed = repo.update_transfer(&renamed).await.unwrap();
        assert!(renamed.updated_at > b.updated_at);

        let page = repo
            .list_transfers_by_status(TransferStatus::Pending, &ListOptions::new())
            .await
            .unwrap();
        let ids: Vec<_> = page.items.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["job-b", "job-a"]);
    }

    #[tokio::test]
    async fn test_update_keeps_status_index_partition() {
        let repo = repo();
        let created = repo.create_transfer(&job("acc-1", "job-1")).await.unwrap();

        // A stale status on the caller's copy does not move the job.
        let mut stale = created.clone();
        stale.status = TransferStatus::Failed;
        repo.update_transfer(&stale).await.unwrap();

        let failed = repo
            .list_transfers_by_status(TransferStatus::Failed, &ListOptions::new())
            .await
            .unwrap();
        assert!(failed.items.is_empty());
        let pending = repo
            .list_transfers_by_status(TransferStatus::Pending, &ListOptions::new())
            .await
            .unwrap();
        assert_eq!(pending.items.len(), 1);
    }
}
