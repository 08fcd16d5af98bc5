use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::Metadata;

/// Key under which TagPlus state lives in the store metadata bag.
pub const METADATA_NAMESPACE: &str = "tagplus";

/// OAuth token triple. `expires_at` is epoch milliseconds.
///
/// Older installs wrote `expiresAt` as a numeric string, so each field is
/// read leniently: a value of the wrong shape reads as absent instead of
/// discarding the whole namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenState {
    #[serde(default, deserialize_with = "lenient::text")]
    pub access_token: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub refresh_token: Option<String>,
    #[serde(default, deserialize_with = "lenient::millis")]
    pub expires_at: Option<i64>,
}

impl TokenState {
    /// Whether the access token is missing or past its expiry.
    #[must_use]
    pub fn needs_refresh(&self, now_ms: i64) -> bool {
        self.access_token.is_none() || self.expires_at.is_none_or(|at| at < now_ms)
    }

    #[must_use]
    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        self.expires_at.is_some_and(|at| at > now_ms)
    }
}

/// Everything stored under `metadata.tagplus` on the store record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagPlusMetadata {
    #[serde(flatten)]
    pub tokens: TokenState,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::timestamp"
    )]
    pub build_time: Option<DateTime<Utc>>,
}

impl TagPlusMetadata {
    /// Read the namespace out of a full metadata bag. A missing namespace
    /// reads as empty state; one that is not an object is logged and read as
    /// empty state too.
    #[must_use]
    pub fn from_store_metadata(metadata: &Metadata) -> Self {
        let Some(value) = metadata.get(METADATA_NAMESPACE) else {
            return Self::default();
        };
        match serde_json::from_value(value.clone()) {
            Ok(state) => state,
            Err(error) => {
                tracing::warn!(
                    error = %error,
                    "unreadable tagplus store metadata; treating as empty"
                );
                Self::default()
            }
        }
    }

    /// Merge `patch` into the namespace of `metadata`, keeping keys the patch
    /// does not mention.
    pub fn merge_into(metadata: &mut Metadata, patch: &serde_json::Value) {
        let entry = metadata
            .entry(METADATA_NAMESPACE)
            .or_insert_with(|| serde_json::Value::Object(Metadata::new()));
        if !entry.is_object() {
            *entry = serde_json::Value::Object(Metadata::new());
        }
        if let (Some(target), Some(source)) = (entry.as_object_mut(), patch.as_object()) {
            for (key, value) in source {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

mod lenient {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::String(text)) if !text.is_empty() => Some(text),
            Some(Value::String(_) | Value::Null) | None => None,
            Some(other) => {
                tracing::warn!(value = %other, "ignoring non-text token in tagplus metadata");
                None
            }
        })
    }

    /// Epoch milliseconds from a JSON number or a numeric string.
    pub fn millis<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        let parsed = match &value {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Number(number)) => number.as_i64().or_else(|| truncate(number.as_f64())),
            Some(Value::String(text)) => {
                let text = text.trim();
                text.parse::<i64>()
                    .ok()
                    .or_else(|| truncate(text.parse::<f64>().ok()))
            }
            Some(_) => None,
        };
        if parsed.is_none() {
            tracing::warn!(value = ?value, "ignoring unreadable expiresAt in tagplus metadata");
        }
        Ok(parsed)
    }

    pub fn timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::String(text)) => match DateTime::parse_from_rfc3339(text.trim()) {
                Ok(at) => Some(at.with_timezone(&Utc)),
                Err(error) => {
                    tracing::warn!(value = %text, error = %error, "ignoring unreadable buildTime");
                    None
                }
            },
            _ => None,
        })
    }

    #[allow(clippy::cast_possible_truncation)]
    fn truncate(value: Option<f64>) -> Option<i64> {
        value.filter(|v| v.is_finite()).map(|v| v as i64)
    }
}

/// The singleton host store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord {
    pub id: Uuid,
    pub name: String,
    pub default_currency_code: Option<String>,
    pub currency_codes: Vec<String>,
    pub metadata: Metadata,
}

impl StoreRecord {
    #[must_use]
    pub fn tagplus(&self) -> TagPlusMetadata {
        TagPlusMetadata::from_store_metadata(&self.metadata)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn namespace_reads_camel_case_keys() {
        let mut metadata = Metadata::new();
        metadata.insert(
            "tagplus".to_string(),
            json!({
                "accessToken": "abc",
                "refreshToken": "def",
                "expiresAt": 1_700_000_000_000_i64,
                "buildTime": "2026-01-02T03:04:05Z"
            }),
        );

        let state = TagPlusMetadata::from_store_metadata(&metadata);
        assert_eq!(state.tokens.access_token.as_deref(), Some("abc"));
        assert_eq!(state.tokens.refresh_token.as_deref(), Some("def"));
        assert_eq!(state.tokens.expires_at, Some(1_700_000_000_000));
        assert!(state.build_time.is_some());
    }

    #[test]
    fn legacy_string_expiry_keeps_the_refresh_token() {
        let mut metadata = Metadata::new();
        metadata.insert(
            "tagplus".to_string(),
            json!({
                "accessToken": "abc",
                "refreshToken": "def",
                "expiresAt": "86400",
                "buildTime": "2026-01-02T03:04:05Z"
            }),
        );

        let state = TagPlusMetadata::from_store_metadata(&metadata);

        assert_eq!(state.tokens.refresh_token.as_deref(), Some("def"));
        assert_eq!(state.tokens.expires_at, Some(86_400));
        assert!(state.tokens.needs_refresh(1_700_000_000_000));
        assert!(state.build_time.is_some());
    }

    #[test]
    fn one_bad_field_does_not_drop_the_others() {
        let mut metadata = Metadata::new();
        metadata.insert(
            "tagplus".to_string(),
            json!({
                "refreshToken": "def",
                "expiresAt": { "seconds": 1 },
                "buildTime": "yesterday"
            }),
        );

        let state = TagPlusMetadata::from_store_metadata(&metadata);

        assert_eq!(state.tokens.refresh_token.as_deref(), Some("def"));
        assert_eq!(state.tokens.expires_at, None);
        assert_eq!(state.build_time, None);
    }

    #[test]
    fn merge_keeps_unrelated_keys() {
        let mut metadata = Metadata::new();
        metadata.insert("other".to_string(), json!(1));
        metadata.insert("tagplus".to_string(), json!({ "buildTime": "2026-01-02T03:04:05Z" }));

        TagPlusMetadata::merge_into(&mut metadata, &json!({ "accessToken": "new" }));

        assert_eq!(metadata["other"], json!(1));
        assert_eq!(metadata["tagplus"]["buildTime"], "2026-01-02T03:04:05Z");
        assert_eq!(metadata["tagplus"]["accessToken"], "new");
    }

    #[test]
    fn missing_token_needs_refresh_and_is_not_valid() {
        let state = TokenState::default();
        assert!(state.needs_refresh(0));
        assert!(!state.is_valid_at(0));
    }

    #[test]
    fn expiry_is_compared_against_now() {
        let state = TokenState {
            access_token: Some("t".to_string()),
            refresh_token: None,
            expires_at: Some(1_000),
        };
        assert!(!state.needs_refresh(999));
        assert!(state.is_valid_at(999));
        assert!(state.needs_refresh(1_001));
        assert!(!state.is_valid_at(1_000));
    }
}
