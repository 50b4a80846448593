//! Composite key encoding.
//!
//! A composite key is the delimiter, the object type, the delimiter, then
//! each attribute followed by the delimiter:
//!
//! ```text
//! \0HISTORY\0LOAN_..._9f\0HIST_..._a1\0
//! ```
//!
//! Because every component is terminated, the encoding of a leading subset
//! of attributes is a strict byte prefix of every key that extends it, and of
//! nothing else. A prefix scan therefore returns exactly the matching keys,
//! in lexicographic order. Simple (non-composite) keys never start with the
//! delimiter, so the two namespaces cannot collide.

use crate::error::{StoreError, StoreResult};

/// Delimiter separating composite key components.
pub const COMPOSITE_KEY_DELIMITER: char = '\u{0}';

/// Build a composite key (or a scan prefix, when `attributes` is a leading
/// subset of a full attribute list).
pub fn composite_key(object_type: &str, attributes: &[&str]) -> StoreResult<String> {
    check_component(object_type, object_type, "object type")?;
    let mut key = String::with_capacity(
        2 + object_type.len() + attributes.iter().map(|a| a.len() + 1).sum::<usize>(),
    );
    key.push(COMPOSITE_KEY_DELIMITER);
    key.push_str(object_type);
    key.push(COMPOSITE_KEY_DELIMITER);
    for attribute in attributes {
        check_component(object_type, attribute, "attribute")?;
        key.push_str(attribute);
        key.push(COMPOSITE_KEY_DELIMITER);
    }
    Ok(key)
}

/// Split a composite key back into its object type and attributes.
pub fn split_composite_key(key: &str) -> StoreResult<(String, Vec<String>)> {
    let invalid = |reason: &str| StoreError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    let body = key
        .strip_prefix(COMPOSITE_KEY_DELIMITER)
        .ok_or_else(|| invalid("not a composite key"))?;
    let body = body
        .strip_suffix(COMPOSITE_KEY_DELIMITER)
        .ok_or_else(|| invalid("unterminated composite key"))?;

    let mut components = body.split(COMPOSITE_KEY_DELIMITER);
    let object_type = components
        .next()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| invalid("missing object type"))?;
    let attributes = components.map(str::to_string).collect();

    Ok((object_type.to_string(), attributes))
}

/// Validate a simple (non-composite) key.
pub(crate) fn check_simple_key(key: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey {
            key: String::new(),
            reason: "empty key".into(),
        });
    }
    Ok(())
}

fn check_component(object_type: &str, component: &str, what: &str) -> StoreResult<()> {
    if component.is_empty() {
        return Err(StoreError::InvalidKey {
            key: object_type.to_string(),
            reason: format!("empty {what}"),
        });
    }
    if component.contains(COMPOSITE_KEY_DELIMITER) {
        return Err(StoreError::InvalidKey {
            key: object_type.to_string(),
            reason: format!("{what} contains the composite key delimiter"),
        });
    }
    Ok(())
}
