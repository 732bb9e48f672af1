//! Cache key derivation and loader name validation.

use serde::Serialize;
use serde_json::Value;

use crate::error::CacheError;

/// Derives the canonical cache key for a call's arguments.
///
/// A scalar string or number is used verbatim, so `load("u1")` stores under
/// a key a human can read back out of the store. Anything else (maps,
/// sequences, booleans, null) is reduced to the hex MD5 digest of its
/// canonical JSON form.
///
/// Derivation is idempotent, and two arguments derive the same key exactly
/// when their JSON forms agree (modulo digest collisions). Note that map
/// ordering is whatever the argument's `Serialize` impl emits; no sorting
/// pass is applied.
pub fn derive_key<A>(args: &A) -> Result<String, CacheError>
where
    A: Serialize + ?Sized,
{
    let value = serde_json::to_value(args).map_err(CacheError::Encode)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        other => format!("{:x}", md5::compute(other.to_string())),
    })
}

/// Checks a loader name against the permitted character class
/// `[A-Za-z0-9:_\-\.\[\]]+`.
pub(crate) fn validate_name(name: &str) -> Result<(), CacheError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '_' | '-' | '.' | '[' | ']'));
    if valid {
        Ok(())
    } else {
        Err(CacheError::InvalidName(name.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_strings_pass_through() {
        assert_eq!(derive_key("u1").unwrap(), "u1");
        assert_eq!(derive_key(&"with spaces allowed").unwrap(), "with spaces allowed");
    }

    #[test]
    fn scalar_numbers_use_display_form() {
        assert_eq!(derive_key(&1).unwrap(), "1");
        assert_eq!(derive_key(&-42i64).unwrap(), "-42");
        assert_eq!(derive_key(&1.5).unwrap(), "1.5");
    }

    #[test]
    fn structured_arguments_hash_to_hex_digests() {
        let key = derive_key(&json!({"a": 1, "b": 2})).unwrap();
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn derivation_is_idempotent() {
        let args = json!(["a", 1, {"nested": true}]);
        assert_eq!(derive_key(&args).unwrap(), derive_key(&args).unwrap());
    }

    #[test]
    fn distinct_json_derives_distinct_keys() {
        let a = derive_key(&json!({"a": 1})).unwrap();
        let b = derive_key(&json!({"a": 2})).unwrap();
        assert_ne!(a, b);

        // A tuple wrapping a scalar is structured, not scalar.
        assert_ne!(derive_key(&("u1",)).unwrap(), "u1");
    }

    #[test]
    fn booleans_and_null_are_hashed() {
        assert_eq!(derive_key(&true).unwrap().len(), 32);
        assert_eq!(derive_key(&json!(null)).unwrap().len(), 32);
    }

    #[test]
    fn name_validation() {
        assert!(validate_name("users").is_ok());
        assert!(validate_name("api:v2.users[main]_x-y").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("bad/name").is_err());
        assert!(validate_name("no spaces").is_err());
    }
}
