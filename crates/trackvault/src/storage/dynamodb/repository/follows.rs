use async_trait::async_trait;
use trackvault_core::library::{validate_follow, validate_identifier, EntityKind, FollowEdge};
use trackvault_core::storage::{DeleteMode, FollowRepository, ListOptions, Page, Result};

use super::super::keys;
use super::super::store::{Index, ItemStore};
use super::{DynamoDbRepository, Listing};

#[async_trait]
impl<S: ItemStore> FollowRepository for DynamoDbRepository<S> {
    async fn create_follow(&self, edge: &FollowEdge) -> Result<FollowEdge> {
        self.put_new(edge).await
    }

    async fn get_follow(&self, follower_id: &str, followed_id: &str) -> Result<FollowEdge> {
        validate_follow(follower_id, followed_id)?;
        self.fetch(
            &keys::follow_key(follower_id, followed_id),
            &format!("{follower_id}->{followed_id}"),
        )
        .await
    }

    async fn delete_follow(
        &self,
        follower_id: &str,
        followed_id: &str,
        mode: DeleteMode,
    ) -> Result<()> {
        validate_follow(follower_id, followed_id)?;
        self.remove(
            &keys::follow_key(follower_id, followed_id),
            EntityKind::FollowEdge,
            &format!("{follower_id}->{followed_id}"),
            mode,
        )
        .await
    }

    async fn list_followers(
        &self,
        followed_id: &str,
        options: &ListOptions,
    ) -> Result<Page<FollowEdge>> {
        validate_identifier("followed_id", followed_id)?;
        let listing = Listing::index(Index::Gsi1, keys::followers_gsi1_pk(followed_id))
            .with_prefix(keys::ACCOUNT_PREFIX);
        self.query_page(&listing, options).await
    }

    async fn list_following(
        &self,
        follower_id: &str,
        options: &ListOptions,
    ) -> Result<Page<FollowEdge>> {
        validate_identifier("follower_id", follower_id)?;
        let listing =
            Listing::table(keys::account_pk(follower_id)).with_prefix(keys::FOLLOWING_PREFIX);
        self.query_page(&listing, options).await
    }
}
