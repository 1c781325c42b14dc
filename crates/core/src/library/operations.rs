//! Pure validation and normalization functions for library entities.

use uuid::Uuid;

use super::error::ValidationError;
use super::types::TransferStatus;

/// Separator between key segments. Identifiers must never contain it.
pub const KEY_SEPARATOR: char = '#';

/// Maximum length of a normalized tag name.
pub const MAX_TAG_NAME_LEN: usize = 64;

/// Namespace for deterministic collection ids.
const COLLECTION_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6b1f_3c2a_9d4e_4f70_8a51_2e7c_0b93_d6a4);

/// Normalizes a tag name: trimmed and lower-cased.
///
/// Every tag read and write goes through this, so lookups are
/// case-insensitive.
///
/// # Example
///
/// ```
/// use trackvault_core::library::normalize_tag_name;
///
/// assert_eq!(normalize_tag_name("  Lo-Fi "), "lo-fi");
/// ```
pub fn normalize_tag_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Normalizes and de-duplicates a set of tag names, keeping first-seen order.
/// Names that are empty after trimming are dropped.
pub fn normalize_tag_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for name in names {
        let normalized = normalize_tag_name(name.as_ref());
        if !normalized.is_empty() && !out.contains(&normalized) {
            out.push(normalized);
        }
    }
    out
}

/// Validates an identifier used as a key segment.
///
/// Rejects identifiers that are empty after trimming or that contain the key
/// separator.
pub fn validate_identifier(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyIdentifier(field));
    }
    if value.contains(KEY_SEPARATOR) {
        return Err(ValidationError::ReservedCharacter {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Validates a tag name and returns its normalized form.
pub fn validate_tag_name(name: &str) -> Result<String, ValidationError> {
    let normalized = normalize_tag_name(name);
    validate_identifier("tag name", &normalized)?;
    if normalized.chars().count() > MAX_TAG_NAME_LEN {
        return Err(ValidationError::TagNameTooLong {
            max: MAX_TAG_NAME_LEN,
        });
    }
    Ok(normalized)
}

/// Validates a follow edge between two accounts.
pub fn validate_follow(follower_id: &str, followed_id: &str) -> Result<(), ValidationError> {
    validate_identifier("follower_id", follower_id)?;
    validate_identifier("followed_id", followed_id)?;
    if follower_id == followed_id {
        return Err(ValidationError::SelfFollow);
    }
    Ok(())
}

/// Validates a transfer status change against the job state machine.
pub fn validate_transition(
    from: TransferStatus,
    to: TransferStatus,
) -> Result<(), ValidationError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(ValidationError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Derives a stable collection id from its owner, title and creator.
///
/// Two concurrent get-or-create calls for the same collection compute the
/// same id, so the conditional create lets exactly one of them win.
pub fn collection_id_for(owner_id: &str, title: &str, creator_name: Option<&str>) -> String {
    let name = format!(
        "{}\n{}\n{}",
        owner_id,
        title.trim().to_lowercase(),
        creator_name.unwrap_or_default().trim().to_lowercase()
    );
    Uuid::new_v5(&COLLECTION_ID_NAMESPACE, name.as_bytes()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_tag_names_dedupes_case_insensitively() {
        let names = normalize_tag_names(["Rock", "rock ", " ROCK", "jazz", "  "]);
        assert_eq!(names, vec!["rock".to_string(), "jazz".to_string()]);
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("id", "abc-123").is_ok());
        assert_eq!(
            validate_identifier("id", "   "),
            Err(ValidationError::EmptyIdentifier("id"))
        );
        assert!(matches!(
            validate_identifier("id", "a#b"),
            Err(ValidationError::ReservedCharacter { .. })
        ));
    }

    #[test]
    fn test_validate_tag_name() {
        assert_eq!(validate_tag_name(" Chill ").unwrap(), "chill");
        assert!(validate_tag_name("").is_err());
        assert!(validate_tag_name(&"x".repeat(MAX_TAG_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_follow_rejects_self() {
        assert_eq!(validate_follow("a", "a"), Err(ValidationError::SelfFollow));
        assert!(validate_follow("a", "b").is_ok());
    }

    #[test]
    fn test_validate_transition() {
        assert!(validate_transition(TransferStatus::Pending, TransferStatus::Processing).is_ok());
        assert!(validate_transition(TransferStatus::Completed, TransferStatus::Failed).is_err());
    }

    #[test]
    fn test_collection_id_is_deterministic() {
        let a = collection_id_for("owner", "Blue Train", Some("Coltrane"));
        let b = collection_id_for("owner", " blue train ", Some("COLTRANE"));
        let c = collection_id_for("other", "Blue Train", Some("Coltrane"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
