//! Opaque pagination cursors.
//!
//! A cursor holds the key of the last item a listing returned, which is the
//! `ExclusiveStartKey` of the next page. Tokens are URL-safe base64 (no
//! padding) of a small JSON object:
//!
//! ```json
//! {"v":1,"idx":"GSI1","pk":"ACCOUNT#a","sk":"ITEM#1","ipk":"...","isk":"..."}
//! ```
//!
//! Decoding is checked against the scope of the listing it is presented to,
//! so a cursor minted by one listing is rejected by every other.

use aws_sdk_dynamodb::types::AttributeValue;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use trackvault_core::storage::RepositoryError;

use super::store::{Index, Item, TableKey, PK, SK};

/// Current token format version.
pub const CURSOR_VERSION: u8 = 1;

/// Resume point of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    /// Index the listing reads, `None` for the base table.
    pub index: Option<Index>,
    pub key: TableKey,
    /// Index key of the last item. Present exactly when `index` is.
    pub index_key: Option<TableKey>,
}

impl Cursor {
    /// Builds the cursor for resuming after `item`.
    pub fn from_item(item: &Item, index: Option<Index>) -> Option<Self> {
        let key = TableKey::from_item(item)?;
        let index_key = match index {
            Some(index) => {
                let pk = item.get(index.pk_attribute())?.as_s().ok()?;
                let sk = item.get(index.sk_attribute())?.as_s().ok()?;
                Some(TableKey::new(pk.clone(), sk.clone()))
            }
            None => None,
        };
        Some(Self {
            index,
            key,
            index_key,
        })
    }

    /// The `ExclusiveStartKey` for the next page.
    pub fn into_start_key(self) -> Item {
        let mut item = self.key.to_item();
        if let (Some(index), Some(index_key)) = (self.index, self.index_key) {
            item.insert(
                index.pk_attribute().to_string(),
                AttributeValue::S(index_key.pk),
            );
            item.insert(
                index.sk_attribute().to_string(),
                AttributeValue::S(index_key.sk),
            );
        }
        item
    }
}

/// The listing a cursor is presented to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorScope<'a> {
    pub index: Option<Index>,
    /// Partition being read (index partition for index listings); `None` for scans.
    pub partition: Option<&'a str>,
    /// Prefix shared by every sort key the listing can return.
    pub sort_prefix: Option<&'a str>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct CursorPayload {
    v: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    idx: Option<String>,
    #[serde(default)]
    pk: Option<String>,
    #[serde(default)]
    sk: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ipk: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    isk: Option<String>,
}

/// Encodes a cursor into an opaque token.
pub fn encode(cursor: &Cursor) -> String {
    let payload = CursorPayload {
        v: CURSOR_VERSION,
        idx: cursor.index.map(|index| index.name().to_string()),
        pk: Some(cursor.key.pk.clone()),
        sk: Some(cursor.key.sk.clone()),
        ipk: cursor.index_key.as_ref().map(|key| key.pk.clone()),
        isk: cursor.index_key.as_ref().map(|key| key.sk.clone()),
    };
    // Serializing a struct of strings cannot fail.
    let json = serde_json::to_vec(&payload).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

fn invalid(reason: impl Into<String>) -> RepositoryError {
    RepositoryError::InvalidCursor(reason.into())
}

/// Decodes a token, checking that it belongs to `scope`.
pub fn decode(token: &str, scope: &CursorScope<'_>) -> Result<Cursor, RepositoryError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|_| invalid("not valid base64"))?;
    let payload: CursorPayload =
        serde_json::from_slice(&bytes).map_err(|_| invalid("malformed payload"))?;

    if payload.v != CURSOR_VERSION {
        return Err(invalid(format!("unsupported version {}", payload.v)));
    }

    let index = match payload.idx.as_deref() {
        Some(name) => {
            Some(Index::from_name(name).ok_or_else(|| invalid(format!("unknown index {name}")))?)
        }
        None => None,
    };
    if index != scope.index {
        return Err(invalid("cursor belongs to a different listing"));
    }

    let key = match (payload.pk, payload.sk) {
        (Some(pk), Some(sk)) => TableKey::new(pk, sk),
        _ => return Err(invalid(format!("missing {PK}/{SK}"))),
    };

    let index_key = match (index, payload.ipk, payload.isk) {
        (Some(_), Some(pk), Some(sk)) => Some(TableKey::new(pk, sk)),
        (Some(index), _, _) => {
            return Err(invalid(format!("missing {} key fields", index.name())));
        }
        (None, None, None) => None,
        (None, _, _) => return Err(invalid("unexpected index key fields")),
    };

    // The key the listing actually ranges over.
    let ranged = index_key.as_ref().unwrap_or(&key);
    if let Some(partition) = scope.partition {
        if ranged.pk != partition {
            return Err(invalid("cursor belongs to a different listing"));
        }
    }
    if let Some(prefix) = scope.sort_prefix {
        if !ranged.sk.starts_with(prefix) {
            return Err(invalid("cursor belongs to a different listing"));
        }
    }

    Ok(Cursor {
        index,
        key,
        index_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn base_cursor() -> Cursor {
        Cursor {
            index: None,
            key: TableKey::new("ACCOUNT#acc-1", "ITEM#t-1"),
            index_key: None,
        }
    }

    fn gsi1_cursor() -> Cursor {
        Cursor {
            index: Some(Index::Gsi1),
            key: TableKey::new("ACCOUNT#acc-1#ITEM#t-1", "TAG#rock"),
            index_key: Some(TableKey::new("ACCOUNT#acc-1#TAG#rock", "ITEM#t-1")),
        }
    }

    const ITEMS_SCOPE: CursorScope<'static> = CursorScope {
        index: None,
        partition: Some("ACCOUNT#acc-1"),
        sort_prefix: Some("ITEM#"),
    };

    const TAG_ITEMS_SCOPE: CursorScope<'static> = CursorScope {
        index: Some(Index::Gsi1),
        partition: Some("ACCOUNT#acc-1#TAG#rock"),
        sort_prefix: Some("ITEM#"),
    };

    fn raw_token(json: &str) -> String {
        URL_SAFE_NO_PAD.encode(json.as_bytes())
    }

    #[test]
    fn test_round_trip_base_and_index() {
        let base = base_cursor();
        assert_eq!(decode(&encode(&base), &ITEMS_SCOPE).unwrap(), base);

        let gsi = gsi1_cursor();
        assert_eq!(decode(&encode(&gsi), &TAG_ITEMS_SCOPE).unwrap(), gsi);
    }

    #[test]
    fn test_token_is_url_safe() {
        let token = encode(&gsi1_cursor());
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_rejects_garbage() {
        for token in ["", "!!!", "bm90IGpzb24", "e30"] {
            assert!(
                matches!(
                    decode(token, &ITEMS_SCOPE),
                    Err(RepositoryError::InvalidCursor(_))
                ),
                "token {token:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_tampered_token() {
        let mut token = encode(&base_cursor());
        token.insert(3, '*');
        assert!(matches!(
            decode(&token, &ITEMS_SCOPE),
            Err(RepositoryError::InvalidCursor(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_version() {
        let token = raw_token(r#"{"v":2,"pk":"ACCOUNT#acc-1","sk":"ITEM#t-1"}"#);
        assert!(decode(&token, &ITEMS_SCOPE).is_err());
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let token = raw_token(r#"{"v":1,"pk":"ACCOUNT#acc-1","sk":"ITEM#t-1","x":"y"}"#);
        assert!(decode(&token, &ITEMS_SCOPE).is_err());
    }

    #[test]
    fn test_rejects_missing_index_keys() {
        let token = raw_token(r#"{"v":1,"idx":"GSI1","pk":"p","sk":"ITEM#1"}"#);
        assert!(decode(&token, &TAG_ITEMS_SCOPE).is_err());
    }

    #[test]
    fn test_rejects_cursor_from_other_index() {
        let token = encode(&base_cursor());
        assert!(decode(&token, &TAG_ITEMS_SCOPE).is_err());

        let token = encode(&gsi1_cursor());
        assert!(decode(&token, &ITEMS_SCOPE).is_err());
    }

    #[test]
    fn test_rejects_cursor_from_other_partition() {
        let token = encode(&base_cursor());
        let other_owner = CursorScope {
            partition: Some("ACCOUNT#acc-2"),
            ..ITEMS_SCOPE
        };
        assert!(decode(&token, &other_owner).is_err());
    }

    #[test]
    fn test_rejects_cursor_from_other_entity_listing() {
        // Same partition, but a tag listing.
        let token = encode(&base_cursor());
        let tags = CursorScope {
            sort_prefix: Some("TAG#"),
            ..ITEMS_SCOPE
        };
        assert!(decode(&token, &tags).is_err());
    }

    #[test]
    fn test_scan_scope_ignores_partition() {
        let cursor = Cursor {
            index: None,
            key: TableKey::new("ACCOUNT#zzz", "PROFILE"),
            index_key: None,
        };
        let scope = CursorScope {
            index: None,
            partition: None,
            sort_prefix: Some("PROFILE"),
        };
        assert_eq!(decode(&encode(&cursor), &scope).unwrap(), cursor);
    }

    #[test]
    fn test_start_key_includes_index_keys() {
        let start = gsi1_cursor().into_start_key();
        assert_eq!(start.len(), 4);
        assert_eq!(
            start.get("GSI1PK"),
            Some(&AttributeValue::S("ACCOUNT#acc-1#TAG#rock".to_string()))
        );
    }

    proptest! {
        #[test]
        fn round_trip_any_key(
            pk_id in "[a-zA-Z0-9_-]{1,24}",
            sk_id in "\\PC{1,24}",
            isk in "\\PC{0,24}",
            on_index in any::<bool>(),
        ) {
            let pk = format!("ACCOUNT#{pk_id}");
            let sk = format!("ITEM#{sk_id}");
            let cursor = Cursor {
                index: on_index.then_some(Index::Gsi2),
                key: TableKey::new(pk.clone(), sk),
                index_key: on_index.then(|| TableKey::new("VISIBILITY#public", format!("CREATED#{isk}"))),
            };
            let scope = if on_index {
                CursorScope { index: Some(Index::Gsi2), partition: Some("VISIBILITY#public"), sort_prefix: Some("CREATED#") }
            } else {
                CursorScope { index: None, partition: Some(pk.as_str()), sort_prefix: Some("ITEM#") }
            };
            prop_assert_eq!(decode(&encode(&cursor), &scope).unwrap(), cursor);
        }
    }
}
