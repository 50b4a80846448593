use chrono::{DateTime, FixedOffset};
use rel_store::{split_composite_key, Transaction};
use rel_types::{ChangeType, IdGenerator};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::LedgerResult;
use crate::history::{HistoryEntry, HISTORY_ID_PREFIX, HISTORY_OBJECT_TYPE};
use crate::ledger::Ledger;

/// Result of walking every history stream.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub entities: usize,
    pub entries: usize,
    pub violations: Vec<Violation>,
}

impl AuditReport {
    /// Returns `true` if all checks passed.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// A specific integrity violation found in a history stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    #[serde(rename = "entityID")]
    pub entity_id: String,
    #[serde(rename = "historyID")]
    pub history_id: String,
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationKind {
    /// The earliest entry of a stream is not a CREATE.
    FirstEntryNotCreate,
    /// An entry's timestamp is earlier than its predecessor's.
    OutOfOrder,
    /// The IDs stored in an entry disagree with the key it is stored under.
    KeyMismatch,
    /// History exists for an entity that has no primary record.
    MissingPrimary,
    /// A history ID does not have the generated shape.
    MalformedHistoryId,
    /// The stored bytes are not a history entry.
    Undecodable,
}

/// History stream integrity validator.
pub struct AuditValidator;

impl AuditValidator {
    /// Validate every history stream in the ledger's committed state.
    pub fn validate_all(ledger: &Ledger) -> LedgerResult<AuditReport> {
        let snapshot = ledger.snapshot();
        let mut report = AuditReport::default();
        let mut stream: Vec<(String, String, Vec<u8>)> = Vec::new();

        let entries: Vec<(String, Vec<u8>)> =
            snapshot.scan_prefix(HISTORY_OBJECT_TYPE, &[])?.collect();

        for (key, bytes) in entries {
            let (entity_id, history_id) = match split_composite_key(&key) {
                Ok((_, attrs)) if attrs.len() == 2 => (attrs[0].clone(), attrs[1].clone()),
                _ => {
                    report.entries += 1;
                    report.violations.push(Violation {
                        entity_id: String::new(),
                        history_id: String::new(),
                        kind: ViolationKind::KeyMismatch,
                        description: format!("history key {key:?} is not [entityID, historyID]"),
                    });
                    continue;
                }
            };

            if stream.first().is_some_and(|(current, _, _)| current != &entity_id) {
                Self::check_stream(&snapshot, std::mem::take(&mut stream), &mut report)?;
            }
            stream.push((entity_id, history_id, bytes));
        }
        if !stream.is_empty() {
            Self::check_stream(&snapshot, stream, &mut report)?;
        }

        if report.is_valid() {
            debug!(entities = report.entities, entries = report.entries, "audit passed");
        } else {
            warn!(violations = report.violations.len(), "audit found violations");
        }
        Ok(report)
    }

    /// Check one entity's stream, given in key order.
    fn check_stream(
        snapshot: &Transaction,
        stream: Vec<(String, String, Vec<u8>)>,
        report: &mut AuditReport,
    ) -> LedgerResult<()> {
        report.entities += 1;
        let mut previous: Option<DateTime<FixedOffset>> = None;
        let mut primary_checked = false;

        for (index, (entity_id, history_id, bytes)) in stream.into_iter().enumerate() {
            report.entries += 1;
            let mut flag = |kind: ViolationKind, description: String| {
                report.violations.push(Violation {
                    entity_id: entity_id.clone(),
                    history_id: history_id.clone(),
                    kind,
                    description,
                });
            };

            if !IdGenerator::is_valid(&history_id, HISTORY_ID_PREFIX) {
                flag(
                    ViolationKind::MalformedHistoryId,
                    format!("{history_id:?} is not a generated history ID"),
                );
            }

            let entry: HistoryEntry = match serde_json::from_slice(&bytes) {
                Ok(entry) => entry,
                Err(e) => {
                    flag(ViolationKind::Undecodable, e.to_string());
                    continue;
                }
            };

            if entry.entity_id != entity_id || entry.history_id != history_id {
                flag(
                    ViolationKind::KeyMismatch,
                    format!(
                        "entry names {}/{} but is stored under {entity_id}/{history_id}",
                        entry.entity_id, entry.history_id
                    ),
                );
            }

            if index == 0 && entry.change_type != ChangeType::Create {
                flag(
                    ViolationKind::FirstEntryNotCreate,
                    format!("first entry is {}", entry.change_type),
                );
            }

            match DateTime::parse_from_rfc3339(&entry.timestamp) {
                Ok(ts) => {
                    if previous.is_some_and(|prev| ts < prev) {
                        flag(
                            ViolationKind::OutOfOrder,
                            format!("timestamp {} precedes the previous entry", entry.timestamp),
                        );
                    }
                    previous = Some(ts);
                }
                Err(e) => flag(
                    ViolationKind::Undecodable,
                    format!("timestamp {:?}: {e}", entry.timestamp),
                ),
            }

            if !primary_checked {
                primary_checked = true;
                let primary = entry.entity_type.primary_key(&entity_id);
                if !snapshot.exists(&primary)? {
                    flag(
                        ViolationKind::MissingPrimary,
                        format!("no primary record at {primary}"),
                    );
                }
            }
        }
        Ok(())
    }
}
