use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::TypeError;
use crate::temporal::TemporalAnchor;

/// Collision-resistant identifier synthesis.
///
/// Identifiers have the shape `<prefix>_<timestamp>_<hashHex>`:
///
/// - `timestamp` is a fixed-width decimal string (nanoseconds since the UNIX
///   epoch, or a [`TemporalAnchor::sort_key`] for ordered identifiers), so
///   identifiers sharing a prefix sort chronologically.
/// - `hashHex` is a truncated, domain-separated BLAKE3 hash over the prefix,
///   the timestamp, and 16 bytes from the thread-local CSPRNG. Uniqueness is
///   carried by the random bytes; two calls in the same nanosecond still
///   differ.
pub struct IdGenerator;

impl IdGenerator {
    /// Width of the nanosecond timestamp component.
    pub const TIMESTAMP_WIDTH: usize = 20;
    /// Number of hash bytes kept (rendered as twice as many hex characters).
    pub const HASH_BYTES: usize = 8;
    /// Shortest timestamp component accepted by [`IdGenerator::validate`].
    const MIN_TIMESTAMP_DIGITS: usize = 13;

    /// Generate a new identifier stamped with the current wall clock.
    ///
    /// Panics only if the operating system entropy source is unavailable.
    pub fn generate(prefix: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let timestamp = format!("{nanos:0width$}", width = Self::TIMESTAMP_WIDTH);
        Self::compose(prefix, &timestamp)
    }

    /// Generate an identifier whose timestamp component is the given anchor.
    ///
    /// Identifiers produced from a monotonic clock sort in creation order.
    pub fn generate_ordered(prefix: &str, anchor: &TemporalAnchor) -> String {
        Self::compose(prefix, &anchor.sort_key())
    }

    /// Check that `id` was produced for `prefix` and is well formed.
    pub fn validate(id: &str, prefix: &str) -> Result<(), TypeError> {
        let invalid = |reason: &str| TypeError::InvalidId {
            id: id.to_string(),
            reason: reason.to_string(),
        };

        let rest = id
            .strip_prefix(prefix)
            .and_then(|r| r.strip_prefix('_'))
            .ok_or_else(|| invalid(&format!("expected prefix '{prefix}_'")))?;

        let (timestamp, hash) = rest
            .rsplit_once('_')
            .ok_or_else(|| invalid("missing hash component"))?;

        if timestamp.len() < Self::MIN_TIMESTAMP_DIGITS
            || !timestamp.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid("timestamp component is not a decimal timestamp"));
        }

        if hash.len() != Self::HASH_BYTES * 2 || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid("hash component has the wrong shape"));
        }

        Ok(())
    }

    /// Boolean form of [`IdGenerator::validate`].
    pub fn is_valid(id: &str, prefix: &str) -> bool {
        Self::validate(id, prefix).is_ok()
    }

    fn compose(prefix: &str, timestamp: &str) -> String {
        let mut entropy = [0u8; 16];
        rand::Rng::fill(&mut rand::thread_rng(), &mut entropy);

        let mut hasher = blake3::Hasher::new();
        hasher.update(b"rel-id-v1:");
        hasher.update(prefix.as_bytes());
        hasher.update(b":");
        hasher.update(timestamp.as_bytes());
        hasher.update(b":");
        hasher.update(&entropy);
        let digest = hasher.finalize();

        format!(
            "{prefix}_{timestamp}_{}",
            hex::encode(&digest.as_bytes()[..Self::HASH_BYTES])
        )
    }
}
