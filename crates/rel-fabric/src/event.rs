use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rel_store::{CommitRecord, EventRecord};
use rel_types::EntityType;
use serde::{Deserialize, Serialize};

use crate::error::{FabricError, Result};

/// The named events published on the change channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventName {
    LoanSubmitted,
    LoanStatusUpdated,
    LoanApproved,
    LoanRejected,
    LoanDisbursed,
    CustomerCreated,
    CustomerUpdated,
    CustomerStatusUpdated,
    ComplianceCaseOpened,
    ComplianceCaseUpdated,
    #[serde(rename = "KYCVerified")]
    KycVerified,
    #[serde(rename = "KYCFailed")]
    KycFailed,
    #[serde(rename = "AMLCheckCompleted")]
    AmlCheckCompleted,
    #[serde(rename = "AMLFlagged")]
    AmlFlagged,
}

impl EventName {
    pub const ALL: [EventName; 14] = [
        Self::LoanSubmitted,
        Self::LoanStatusUpdated,
        Self::LoanApproved,
        Self::LoanRejected,
        Self::LoanDisbursed,
        Self::CustomerCreated,
        Self::CustomerUpdated,
        Self::CustomerStatusUpdated,
        Self::ComplianceCaseOpened,
        Self::ComplianceCaseUpdated,
        Self::KycVerified,
        Self::KycFailed,
        Self::AmlCheckCompleted,
        Self::AmlFlagged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoanSubmitted => "LoanSubmitted",
            Self::LoanStatusUpdated => "LoanStatusUpdated",
            Self::LoanApproved => "LoanApproved",
            Self::LoanRejected => "LoanRejected",
            Self::LoanDisbursed => "LoanDisbursed",
            Self::CustomerCreated => "CustomerCreated",
            Self::CustomerUpdated => "CustomerUpdated",
            Self::CustomerStatusUpdated => "CustomerStatusUpdated",
            Self::ComplianceCaseOpened => "ComplianceCaseOpened",
            Self::ComplianceCaseUpdated => "ComplianceCaseUpdated",
            Self::KycVerified => "KYCVerified",
            Self::KycFailed => "KYCFailed",
            Self::AmlCheckCompleted => "AMLCheckCompleted",
            Self::AmlFlagged => "AMLFlagged",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventName {
    type Err = FabricError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|n| n.as_str() == s)
            .ok_or_else(|| FabricError::UnknownEvent(s.to_string()))
    }
}

/// Normalized change-notification payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub event_type: EventName,
    #[serde(rename = "entityID")]
    pub entity_id: String,
    pub entity_type: EntityType,
    #[serde(rename = "actorID")]
    pub actor_id: String,
    /// RFC 3339 timestamp of the unit of work that produced the event.
    pub timestamp: String,
    /// Snapshot of the entity after the change.
    pub data: serde_json::Value,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl ChangeEvent {
    /// Build a payload, snapshotting `data` as JSON.
    pub fn build<T: Serialize>(
        event_type: EventName,
        entity_id: impl Into<String>,
        entity_type: EntityType,
        actor_id: impl Into<String>,
        timestamp: impl Into<String>,
        data: &T,
        metadata: BTreeMap<String, String>,
    ) -> Result<Self> {
        let data =
            serde_json::to_value(data).map_err(|e| FabricError::Serialization(e.to_string()))?;
        Ok(Self {
            event_type,
            entity_id: entity_id.into(),
            entity_type,
            actor_id: actor_id.into(),
            timestamp: timestamp.into(),
            data,
            metadata,
        })
    }

    /// Encode into the opaque record a store commit carries.
    pub fn to_record(&self) -> Result<EventRecord> {
        let payload =
            serde_json::to_vec(self).map_err(|e| FabricError::Serialization(e.to_string()))?;
        Ok(EventRecord {
            name: self.event_type.as_str().to_string(),
            payload,
        })
    }

    /// Decode a committed record, checking that its name matches its payload.
    pub fn from_record(record: &EventRecord) -> Result<Self> {
        let name: EventName = record.name.parse()?;
        let event: Self = serde_json::from_slice(&record.payload)
            .map_err(|e| FabricError::Serialization(e.to_string()))?;
        if event.event_type != name {
            return Err(FabricError::Serialization(format!(
                "record named {name} carries a {} payload",
                event.event_type
            )));
        }
        Ok(event)
    }
}

/// An event together with the commit that made it durable.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedEvent {
    pub commit_seq: u64,
    pub tx_id: String,
    pub event: ChangeEvent,
}

/// Decode every event carried by a commit record, in staging order.
pub fn decode_committed(record: &CommitRecord) -> Result<Vec<CommittedEvent>> {
    record
        .events
        .iter()
        .map(|event| {
            Ok(CommittedEvent {
                commit_seq: record.seq,
                tx_id: record.tx_id.clone(),
                event: ChangeEvent::from_record(event)?,
            })
        })
        .collect()
}
