use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// The instant a unit of work is stamped with.
///
/// Every history entry and event produced by one unit of work shares the
/// same anchor, so entries written together carry one timestamp. Anchors
/// come from the ledger's hybrid logical clock: the logical counter keeps
/// two units in the same millisecond apart, and the node id separates
/// writers.
///
/// Field order is the comparison order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TemporalAnchor {
    pub physical_ms: u64,
    pub logical: u32,
    pub node_id: u16,
}

impl TemporalAnchor {
    pub fn new(physical_ms: u64, logical: u32, node_id: u16) -> Self {
        Self {
            physical_ms,
            logical,
            node_id,
        }
    }

    /// Wall-clock milliseconds since the UNIX epoch.
    pub fn wall_clock_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    /// Ordered key used inside history IDs.
    ///
    /// Zero-padded to 13 + 10 + 5 digits, so byte order agrees with
    /// anchor order for any timestamp before the year 2286.
    pub fn sort_key(&self) -> String {
        format!(
            "{:013}{:010}{:05}",
            self.physical_ms, self.logical, self.node_id
        )
    }

    /// Inverse of [`sort_key`](Self::sort_key).
    pub fn from_sort_key(key: &str) -> Option<Self> {
        if key.len() != 28 || !key.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self {
            physical_ms: key[..13].parse().ok()?,
            logical: key[13..23].parse().ok()?,
            node_id: key[23..].parse().ok()?,
        })
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.physical_ms as i64)
            .single()
            .unwrap_or_default()
    }

    /// RFC 3339 rendering with millisecond precision, as stored on history
    /// entries and events.
    pub fn rfc3339(&self) -> String {
        self.to_datetime()
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl fmt::Display for TemporalAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}+{}", self.node_id, self.physical_ms, self.logical)
    }
}
