//! DynamoDB key generation functions.
//!
//! Pure functions for generating partition and sort keys following the single-table design.
//! Every key segment starts with a type tag, so keys of different entity types never collide.
//! Identifiers are validated by the repository before they reach these functions.

use chrono::{DateTime, SecondsFormat, Utc};
use trackvault_core::library::{normalize_tag_name, EntityKind, TransferStatus};

use super::store::TableKey;

// ============================================================================
// Key prefixes
// ============================================================================

pub const ACCOUNT_PREFIX: &str = "ACCOUNT#";
pub const EMAIL_PREFIX: &str = "EMAIL#";
pub const ITEM_PREFIX: &str = "ITEM#";
pub const COLLECTION_PREFIX: &str = "COLLECTION#";
pub const LIST_PREFIX: &str = "LIST#";
pub const POSITION_PREFIX: &str = "POSITION#";
pub const TAG_PREFIX: &str = "TAG#";
pub const CREATOR_PREFIX: &str = "CREATOR#";
pub const TRANSFER_PREFIX: &str = "TRANSFER#";
pub const TRANSFER_STATUS_PREFIX: &str = "TRANSFER#STATUS#";
pub const FOLLOWING_PREFIX: &str = "FOLLOWING#";
pub const FOLLOWERS_PREFIX: &str = "FOLLOWERS#";
pub const CREATED_PREFIX: &str = "CREATED#";

/// Sort key of the account profile item.
pub const PROFILE_SK: &str = "PROFILE";
/// Sort key of the creator profile item.
pub const CREATOR_SK: &str = "CREATOR";
/// GSI1 partition shared by every creator profile (discovery index).
pub const CREATOR_DISCOVERY_PK: &str = "CREATOR_PROFILE";
/// GSI2 partition of publicly visible content items.
pub const PUBLIC_VISIBILITY_PK: &str = "VISIBILITY#public";

/// Formats a timestamp so that lexical order equals chronological order.
pub fn sortable_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ============================================================================
// Account keys
// ============================================================================

/// Generate partition key for an Account and everything it owns.
///
/// Pattern: `ACCOUNT#<account_id>`
pub fn account_pk(account_id: &str) -> String {
    format!("{ACCOUNT_PREFIX}{account_id}")
}

/// Primary key of an account profile item.
pub fn account_key(account_id: &str) -> TableKey {
    TableKey::new(account_pk(account_id), PROFILE_SK)
}

/// Generate GSI1 partition key for account email lookup.
///
/// Pattern: `EMAIL#<lower-cased email>`
pub fn email_gsi1_pk(email: &str) -> String {
    format!("{EMAIL_PREFIX}{}", email.trim().to_lowercase())
}

// ============================================================================
// Content item and collection keys
// ============================================================================

/// Pattern: `ITEM#<item_id>`
pub fn item_sk(item_id: &str) -> String {
    format!("{ITEM_PREFIX}{item_id}")
}

pub fn item_key(owner_id: &str, item_id: &str) -> TableKey {
    TableKey::new(account_pk(owner_id), item_sk(item_id))
}

/// Generate GSI1 partition key for "everything an owner has by a creator".
///
/// Pattern: `ACCOUNT#<owner_id>#CREATOR#<lower-cased creator>`
pub fn creator_gsi1_pk(owner_id: &str, creator_name: &str) -> String {
    format!(
        "{ACCOUNT_PREFIX}{owner_id}#{CREATOR_PREFIX}{}",
        creator_name.trim().to_lowercase()
    )
}

/// Generate GSI2 sort key for the public visibility index.
///
/// Pattern: `CREATED#<created_at>#<item_id>`
pub fn public_gsi2_sk(created_at: &DateTime<Utc>, item_id: &str) -> String {
    format!("{CREATED_PREFIX}{}#{item_id}", sortable_timestamp(created_at))
}

/// Pattern: `COLLECTION#<collection_id>`
pub fn collection_sk(collection_id: &str) -> String {
    format!("{COLLECTION_PREFIX}{collection_id}")
}

pub fn collection_key(owner_id: &str, collection_id: &str) -> TableKey {
    TableKey::new(account_pk(owner_id), collection_sk(collection_id))
}

// ============================================================================
// Named list keys
// ============================================================================

/// Pattern: `LIST#<list_id>`
pub fn list_sk(list_id: &str) -> String {
    format!("{LIST_PREFIX}{list_id}")
}

pub fn list_key(owner_id: &str, list_id: &str) -> TableKey {
    TableKey::new(account_pk(owner_id), list_sk(list_id))
}

/// Generate partition key holding a list's memberships.
///
/// Pattern: `LIST#<list_id>`
pub fn membership_pk(list_id: &str) -> String {
    format!("{LIST_PREFIX}{list_id}")
}

/// Generate sort key for a membership position.
///
/// Pattern: `POSITION#<8-digit zero-padded position>`
pub fn position_sk(position: u32) -> String {
    format!("{POSITION_PREFIX}{position:08}")
}

pub fn membership_key(list_id: &str, position: u32) -> TableKey {
    TableKey::new(membership_pk(list_id), position_sk(position))
}

/// Reads the position back out of a membership sort key.
pub fn parse_position_sk(sk: &str) -> Option<u32> {
    sk.strip_prefix(POSITION_PREFIX)?.parse().ok()
}

// ============================================================================
// Tag keys
// ============================================================================

/// Pattern: `TAG#<normalized tag name>`
pub fn tag_sk(tag_name: &str) -> String {
    format!("{TAG_PREFIX}{}", normalize_tag_name(tag_name))
}

pub fn tag_key(owner_id: &str, tag_name: &str) -> TableKey {
    TableKey::new(account_pk(owner_id), tag_sk(tag_name))
}

/// Generate partition key holding an item's tag associations.
///
/// Pattern: `ACCOUNT#<owner_id>#ITEM#<item_id>`
pub fn item_tags_pk(owner_id: &str, item_id: &str) -> String {
    format!("{ACCOUNT_PREFIX}{owner_id}#{ITEM_PREFIX}{item_id}")
}

pub fn item_tag_key(owner_id: &str, item_id: &str, tag_name: &str) -> TableKey {
    TableKey::new(item_tags_pk(owner_id, item_id), tag_sk(tag_name))
}

/// Generate GSI1 partition key listing the items carrying a tag.
///
/// Pattern: `ACCOUNT#<owner_id>#TAG#<normalized tag name>`
pub fn tag_items_gsi1_pk(owner_id: &str, tag_name: &str) -> String {
    format!(
        "{ACCOUNT_PREFIX}{owner_id}#{TAG_PREFIX}{}",
        normalize_tag_name(tag_name)
    )
}

// ============================================================================
// Transfer job keys
// ============================================================================

/// Pattern: `TRANSFER#<job_id>`
pub fn transfer_sk(job_id: &str) -> String {
    format!("{TRANSFER_PREFIX}{job_id}")
}

pub fn transfer_key(owner_id: &str, job_id: &str) -> TableKey {
    TableKey::new(account_pk(owner_id), transfer_sk(job_id))
}

/// Generate GSI1 partition key for "all jobs in a status".
///
/// Pattern: `TRANSFER#STATUS#<STATUS>`
pub fn transfer_status_gsi1_pk(status: TransferStatus) -> String {
    format!("{TRANSFER_STATUS_PREFIX}{}", status.as_str())
}

/// Generate GSI1 sort key for the status index.
///
/// Pattern: `<updated_at>#<job_id>`
pub fn transfer_status_gsi1_sk(updated_at: &DateTime<Utc>, job_id: &str) -> String {
    format!("{}#{job_id}", sortable_timestamp(updated_at))
}

// ============================================================================
// Creator profile and follow keys
// ============================================================================

pub fn creator_key(account_id: &str) -> TableKey {
    TableKey::new(account_pk(account_id), CREATOR_SK)
}

/// Pattern: `FOLLOWING#<followed_id>`
pub fn following_sk(followed_id: &str) -> String {
    format!("{FOLLOWING_PREFIX}{followed_id}")
}

pub fn follow_key(follower_id: &str, followed_id: &str) -> TableKey {
    TableKey::new(account_pk(follower_id), following_sk(followed_id))
}

/// Generate GSI1 partition key listing an account's followers.
///
/// Pattern: `FOLLOWERS#<followed_id>`
pub fn followers_gsi1_pk(followed_id: &str) -> String {
    format!("{FOLLOWERS_PREFIX}{followed_id}")
}

// ============================================================================
// Partition key parsing
// ============================================================================

/// Owner of a partition, recovered from its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionOwner<'a> {
    /// `ACCOUNT#<id>`: the profile and everything the account owns.
    Account { account_id: &'a str },
    /// `ACCOUNT#<owner>#ITEM#<item>`: tag associations of one item.
    ContentItem { owner_id: &'a str, item_id: &'a str },
    /// `LIST#<id>`: memberships of one list.
    NamedList { list_id: &'a str },
}

impl PartitionOwner<'_> {
    pub fn kind(&self) -> EntityKind {
        match self {
            PartitionOwner::Account { .. } => EntityKind::Account,
            PartitionOwner::ContentItem { .. } => EntityKind::ContentItem,
            PartitionOwner::NamedList { .. } => EntityKind::NamedList,
        }
    }
}

/// Reveals which entity owns a partition key.
pub fn parse_partition_key(pk: &str) -> Option<PartitionOwner<'_>> {
    if let Some(rest) = pk.strip_prefix(LIST_PREFIX) {
        return (!rest.is_empty() && !rest.contains('#'))
            .then_some(PartitionOwner::NamedList { list_id: rest });
    }

    let rest = pk.strip_prefix(ACCOUNT_PREFIX)?;
    match rest.split_once('#') {
        None if !rest.is_empty() => Some(PartitionOwner::Account { account_id: rest }),
        None => None,
        Some((owner_id, tail)) => {
            let item_id = tail.strip_prefix(ITEM_PREFIX)?;
            (!owner_id.is_empty() && !item_id.is_empty() && !item_id.contains('#'))
                .then_some(PartitionOwner::ContentItem { owner_id, item_id })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_account_keys() {
        let key = account_key("acc-1");
        assert_eq!(key.pk, "ACCOUNT#acc-1");
        assert_eq!(key.sk, "PROFILE");
    }

    #[test]
    fn test_email_gsi1_pk_is_case_folded() {
        assert_eq!(email_gsi1_pk(" Alice@Example.COM "), "EMAIL#alice@example.com");
    }

    #[test]
    fn test_creator_gsi1_pk() {
        assert_eq!(
            creator_gsi1_pk("acc-1", "Miles Davis"),
            "ACCOUNT#acc-1#CREATOR#miles davis"
        );
    }

    #[test]
    fn test_position_sk_is_zero_padded() {
        assert_eq!(position_sk(0), "POSITION#00000000");
        assert_eq!(position_sk(42), "POSITION#00000042");
        assert!(position_sk(9) < position_sk(10));
        assert!(position_sk(99) < position_sk(100));
    }

    #[test]
    fn test_parse_position_sk() {
        assert_eq!(parse_position_sk("POSITION#00000042"), Some(42));
        assert_eq!(parse_position_sk("TAG#42"), None);
        assert_eq!(parse_position_sk("POSITION#abc"), None);
    }

    #[test]
    fn test_tag_keys_are_normalized() {
        assert_eq!(tag_key("acc-1", "Rock").sk, "TAG#rock");
        assert_eq!(item_tag_key("acc-1", "t-1", " ROCK ").sk, "TAG#rock");
        assert_eq!(tag_items_gsi1_pk("acc-1", "Rock"), "ACCOUNT#acc-1#TAG#rock");
        assert_eq!(item_tags_pk("acc-1", "t-1"), "ACCOUNT#acc-1#ITEM#t-1");
    }

    #[test]
    fn test_transfer_status_keys() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(
            transfer_status_gsi1_pk(TransferStatus::Processing),
            "TRANSFER#STATUS#PROCESSING"
        );
        assert_eq!(
            transfer_status_gsi1_sk(&at, "job-1"),
            "2024-03-01T12:00:00.000Z#job-1"
        );
    }

    #[test]
    fn test_sortable_timestamp_orders_chronologically() {
        let earlier = Utc.with_ymd_and_hms(2024, 1, 9, 23, 59, 59).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        assert!(sortable_timestamp(&earlier) < sortable_timestamp(&later));
    }

    #[test]
    fn test_follow_keys() {
        let key = follow_key("a", "b");
        assert_eq!(key.pk, "ACCOUNT#a");
        assert_eq!(key.sk, "FOLLOWING#b");
        assert_eq!(followers_gsi1_pk("b"), "FOLLOWERS#b");
    }

    #[test]
    fn test_keys_of_different_types_never_collide() {
        let id = "x";
        let sort_keys = [
            PROFILE_SK.to_string(),
            CREATOR_SK.to_string(),
            item_sk(id),
            collection_sk(id),
            list_sk(id),
            tag_sk(id),
            transfer_sk(id),
            following_sk(id),
        ];
        for (i, a) in sort_keys.iter().enumerate() {
            for b in &sort_keys[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_parse_partition_key() {
        assert_eq!(
            parse_partition_key("ACCOUNT#acc-1"),
            Some(PartitionOwner::Account {
                account_id: "acc-1"
            })
        );
        assert_eq!(
            parse_partition_key("ACCOUNT#acc-1#ITEM#t-9"),
            Some(PartitionOwner::ContentItem {
                owner_id: "acc-1",
                item_id: "t-9"
            })
        );
        assert_eq!(
            parse_partition_key("LIST#l-1"),
            Some(PartitionOwner::NamedList { list_id: "l-1" })
        );
        assert_eq!(
            parse_partition_key("LIST#l-1").map(|owner| owner.kind()),
            Some(EntityKind::NamedList)
        );
        assert_eq!(parse_partition_key("ACCOUNT#"), None);
        assert_eq!(parse_partition_key("ACCOUNT#a#TAG#rock"), None);
        assert_eq!(parse_partition_key("TRANSFER#STATUS#PENDING"), None);
    }
}
