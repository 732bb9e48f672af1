//! The stored cache entry.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// The unit stored under every data key, serialized as
/// `{"createTime": <ms>, "value": <any>}`.
///
/// A blob that fails to decode into this shape, a missing `createTime`
/// included, is treated as a miss by the read path, never as an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<V> {
    /// Milliseconds since epoch at the moment the loader produced `value`.
    pub create_time: i64,
    /// The loader's payload.
    pub value: V,
}

impl<V> CacheEntry<V> {
    /// Wraps a freshly loaded value, stamped with the current time.
    pub fn now(value: V) -> Self {
        CacheEntry {
            create_time: Utc::now().timestamp_millis(),
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn serializes_with_camel_case_create_time() {
        let entry = CacheEntry {
            create_time: 1_700_000_000_000,
            value: json!({"id": "u1"}),
        };
        let raw = serde_json::to_string(&entry).unwrap();
        assert!(raw.contains("\"createTime\":1700000000000"));
        assert!(!raw.contains("create_time"));
    }

    #[test]
    fn decode_requires_create_time() {
        let missing = serde_json::from_str::<CacheEntry<Value>>(r#"{"value": 1}"#);
        assert!(missing.is_err());

        let present =
            serde_json::from_str::<CacheEntry<Value>>(r#"{"createTime": 5, "value": 1}"#).unwrap();
        assert_eq!(present.value, json!(1));
    }

    #[test]
    fn now_stamps_wall_clock_millis() {
        let before = Utc::now().timestamp_millis();
        let entry = CacheEntry::now("x");
        assert!(entry.create_time >= before);
    }
}
