//! [`DirectoryClient`] backed by a Cognito user pool.
//!
//! Subjects are pool usernames, which are the account ids. Roles map to pool
//! groups of the same name, the enabled flag to the user's enabled status.

use std::fmt::Debug;

use async_trait::async_trait;
use aws_sdk_cognitoidentityprovider::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_cognitoidentityprovider::Client;
use trackvault_core::directory::{DirectoryClient, DirectoryError, Result};

use crate::config::Config;

/// Cognito-backed directory.
#[derive(Debug, Clone)]
pub struct CognitoDirectory {
    client: Client,
    user_pool_id: String,
}

impl CognitoDirectory {
    pub fn new(client: Client, user_pool_id: impl Into<String>) -> Self {
        Self {
            client,
            user_pool_id: user_pool_id.into(),
        }
    }

    /// Creates a directory from configuration with the default credential
    /// chain. Returns `None` when no user pool is configured.
    pub async fn from_config(config: &Config) -> Option<Self> {
        let user_pool_id = config.cognito_user_pool_id.clone()?;
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Some(Self::new(Client::new(&sdk_config), user_pool_id))
    }

    pub fn user_pool_id(&self) -> &str {
        &self.user_pool_id
    }
}

/// Map a Cognito SDK error to DirectoryError.
///
/// Errors without a service error code never reached the pool (dispatch,
/// timeout, response parsing) and count as unavailability.
fn map_sdk_error<E, R>(operation: &str, subject: &str, err: SdkError<E, R>) -> DirectoryError
where
    E: ProvideErrorMetadata + Debug,
    R: Debug,
{
    match err {
        SdkError::ServiceError(context) => {
            let err = context.err();
            let message = err.message().unwrap_or("no message");
            match err.code() {
                Some("UserNotFoundException") => DirectoryError::SubjectNotFound(subject.to_string()),
                Some("TooManyRequestsException") | Some("InternalErrorException") => {
                    DirectoryError::Unavailable(format!("{operation}: {message}"))
                }
                Some(code) => DirectoryError::Rejected(format!("{operation}: {code}: {message}")),
                None => DirectoryError::Unavailable(format!("{operation} failed: {err:?}")),
            }
        }
        err => DirectoryError::Unavailable(format!("{operation} failed: {err:?}")),
    }
}

#[async_trait]
impl DirectoryClient for CognitoDirectory {
    async fn get_groups(&self, subject: &str) -> Result<Vec<String>> {
        let mut groups = Vec::new();
        let mut next_token = None;
        loop {
            let output = self
                .client
                .admin_list_groups_for_user()
                .user_pool_id(&self.user_pool_id)
                .username(subject)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|err| map_sdk_error("AdminListGroupsForUser", subject, err))?;

            groups.extend(
                output
                    .groups()
                    .iter()
                    .filter_map(|group| group.group_name().map(str::to_string)),
            );
            next_token = output.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }
        tracing::debug!(subject = %subject, groups = ?groups, "Fetched directory groups");
        Ok(groups)
    }

    async fn add_to_group(&self, subject: &str, group: &str) -> Result<()> {
        self.client
            .admin_add_user_to_group()
            .user_pool_id(&self.user_pool_id)
            .username(subject)
            .group_name(group)
            .send()
            .await
            .map_err(|err| map_sdk_error("AdminAddUserToGroup", subject, err))?;
        tracing::debug!(subject = %subject, group = %group, "Added to directory group");
        Ok(())
    }

    async fn remove_from_group(&self, subject: &str, group: &str) -> Result<()> {
        self.client
            .admin_remove_user_from_group()
            .user_pool_id(&self.user_pool_id)
            .username(subject)
            .group_name(group)
            .send()
            .await
            .map_err(|err| map_sdk_error("AdminRemoveUserFromGroup", subject, err))?;
        tracing::debug!(subject = %subject, group = %group, "Removed from directory group");
        Ok(())
    }

    async fn is_enabled(&self, subject: &str) -> Result<bool> {
        let output = self
            .client
            .admin_get_user()
            .user_pool_id(&self.user_pool_id)
            .username(subject)
            .send()
            .await
            .map_err(|err| map_sdk_error("AdminGetUser", subject, err))?;
        Ok(output.enabled())
    }

    async fn enable(&self, subject: &str) -> Result<()> {
        self.client
            .admin_enable_user()
            .user_pool_id(&self.user_pool_id)
            .username(subject)
            .send()
            .await
            .map_err(|err| map_sdk_error("AdminEnableUser", subject, err))?;
        tracing::debug!(subject = %subject, "Enabled directory user");
        Ok(())
    }

    async fn disable(&self, subject: &str) -> Result<()> {
        self.client
            .admin_disable_user()
            .user_pool_id(&self.user_pool_id)
            .username(subject)
            .send()
            .await
            .map_err(|err| map_sdk_error("AdminDisableUser", subject, err))?;
        tracing::debug!(subject = %subject, "Disabled directory user");
        Ok(())
    }
}
