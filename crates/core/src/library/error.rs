use thiserror::Error;

/// Errors raised while validating identifiers and domain values, before any
/// store call is made.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} cannot be empty")]
    EmptyIdentifier(&'static str),
    #[error("{field} contains a reserved character: {value}")]
    ReservedCharacter { field: &'static str, value: String },
    #[error("Tag name too long (max {max} characters)")]
    TagNameTooLong { max: usize },
    #[error("Accounts cannot follow themselves")]
    SelfFollow,
    #[error("Invalid transfer transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("Unknown role: {0}")]
    UnknownRole(String),
    #[error("Unknown visibility: {0}")]
    UnknownVisibility(String),
    #[error("Unknown transfer status: {0}")]
    UnknownTransferStatus(String),
    #[error("Unknown entity type: {0}")]
    UnknownEntityKind(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        assert_eq!(
            ValidationError::EmptyIdentifier("owner_id").to_string(),
            "owner_id cannot be empty"
        );
        assert_eq!(
            ValidationError::ReservedCharacter {
                field: "tag",
                value: "a#b".to_string(),
            }
            .to_string(),
            "tag contains a reserved character: a#b"
        );
        assert_eq!(
            ValidationError::InvalidTransition {
                from: "COMPLETED".to_string(),
                to: "PENDING".to_string(),
            }
            .to_string(),
            "Invalid transfer transition: COMPLETED -> PENDING"
        );
    }
}
