use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::Utc;
use trackvault_core::library::{validate_identifier, Account, EntityKind, GlobalAccess, Role};
use trackvault_core::storage::{
    AccountRepository, DeleteMode, ListOptions, Page, RepositoryError, Result,
};

use super::super::conversions::{StoredEntity, ATTR_DISABLED, ATTR_ROLE, ATTR_UPDATED_AT};
use super::super::keys;
use super::super::store::{Condition, Index, ItemStore, QueryRequest, StoreError, Update};
use super::{conflict, not_found, timestamp, DynamoDbRepository};

impl<S: ItemStore> DynamoDbRepository<S> {
    /// Applies a targeted update to a privileged account attribute.
    ///
    /// A failed condition is told apart by re-reading: a missing account is
    /// `NotFound`, a present one holds a value other than the expected one.
    async fn set_account_attribute(
        &self,
        id: &str,
        update: Update,
        condition: Condition,
    ) -> Result<Account> {
        validate_identifier("account_id", id)?;
        let key = keys::account_key(id);
        let updates = vec![update, Update::set(ATTR_UPDATED_AT, timestamp(&Utc::now()))];

        match self.store.update_item(&key, updates, Some(condition)).await {
            Ok(item) => Account::from_item(&item),
            Err(StoreError::ConditionFailed) => match self.store.get_item(&key).await? {
                Some(_) => Err(conflict(EntityKind::Account, id)),
                None => Err(not_found(EntityKind::Account, id)),
            },
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl<S: ItemStore> AccountRepository for DynamoDbRepository<S> {
    async fn create_account(&self, account: &Account) -> Result<Account> {
        self.put_new(account).await
    }

    async fn get_account(&self, id: &str) -> Result<Account> {
        validate_identifier("account_id", id)?;
        self.fetch(&keys::account_key(id), id).await
    }

    async fn get_account_by_email(&self, email: &str) -> Result<Account> {
        if email.trim().is_empty() {
            return Err(RepositoryError::InvalidInput(
                "email cannot be empty".to_string(),
            ));
        }

        let page = self
            .store
            .query(
                QueryRequest::new(keys::email_gsi1_pk(email))
                    .on_index(Index::Gsi1)
                    .sort_begins_with(keys::ACCOUNT_PREFIX)
                    .limit(1),
            )
            .await?;

        match page.items.first() {
            Some(item) => Account::from_item(item),
            None => Err(not_found(EntityKind::Account, email.trim())),
        }
    }

    async fn update_account(&self, account: &Account) -> Result<Account> {
        self.overwrite(account).await
    }

    async fn delete_account(&self, id: &str, mode: DeleteMode) -> Result<()> {
        validate_identifier("account_id", id)?;
        self.remove(&keys::account_key(id), EntityKind::Account, id, mode)
            .await
    }

    async fn set_role(&self, id: &str, role: Role, expected: Option<Role>) -> Result<Account> {
        let condition = match expected {
            Some(expected) => {
                Condition::equals(ATTR_ROLE, AttributeValue::S(expected.as_str().to_string()))
            }
            None => Condition::Exists,
        };
        let update = Update::set(ATTR_ROLE, AttributeValue::S(role.as_str().to_string()));

        let account = self.set_account_attribute(id, update, condition).await?;
        tracing::debug!(account_id = %id, role = %role, "Account role written");
        Ok(account)
    }

    async fn set_disabled(
        &self,
        id: &str,
        disabled: bool,
        expected: Option<bool>,
    ) -> Result<Account> {
        let condition = match expected {
            Some(expected) => Condition::equals(ATTR_DISABLED, AttributeValue::Bool(expected)),
            None => Condition::Exists,
        };
        let update = Update::set(ATTR_DISABLED, AttributeValue::Bool(disabled));

        let account = self.set_account_attribute(id, update, condition).await?;
        tracing::debug!(account_id = %id, disabled, "Account status written");
        Ok(account)
    }

    async fn scan_accounts(
        &self,
        _access: GlobalAccess,
        options: &ListOptions,
    ) -> Result<Page<Account>> {
        self.scan_page(keys::PROFILE_SK, options).await
    }
}
