use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// The closed set of record kinds tracked by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    /// A loan application.
    Loan,
    /// A customer profile.
    Customer,
    /// A KYC/AML/sanctions compliance case.
    ComplianceCase,
}

impl EntityType {
    /// Every entity type, in declaration order.
    pub const ALL: [EntityType; 3] = [Self::Loan, Self::Customer, Self::ComplianceCase];

    /// Canonical name used in history entries and event payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loan => "LOAN",
            Self::Customer => "CUSTOMER",
            Self::ComplianceCase => "COMPLIANCE_CASE",
        }
    }

    /// Prefix carried by identifiers of this type.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::Loan => "LOAN",
            Self::Customer => "CUST",
            Self::ComplianceCase => "CASE",
        }
    }

    /// Prefix of the primary record key.
    pub fn key_prefix(&self) -> &'static str {
        match self {
            Self::Loan => "LOAN",
            Self::Customer => "CUSTOMER",
            Self::ComplianceCase => "CASE",
        }
    }

    /// Primary record key: `<TYPE_PREFIX>_<entityID>`.
    pub fn primary_key(&self, entity_id: &str) -> String {
        format!("{}_{entity_id}", self.key_prefix())
    }

    /// Infer the entity type from an identifier's prefix.
    pub fn from_id(entity_id: &str) -> Option<Self> {
        let (prefix, _) = entity_id.split_once('_')?;
        Self::ALL.into_iter().find(|t| t.id_prefix() == prefix)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TypeError::UnknownEntityType(s.to_string()))
    }
}

/// Classification of a history entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    Create,
    Update,
    Approve,
    Reject,
    StatusUpdate,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Approve => "APPROVE",
            Self::Reject => "REJECT",
            Self::StatusUpdate => "STATUS_UPDATE",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(Self::Create),
            "UPDATE" => Ok(Self::Update),
            "APPROVE" => Ok(Self::Approve),
            "REJECT" => Ok(Self::Reject),
            "STATUS_UPDATE" => Ok(Self::StatusUpdate),
            other => Err(TypeError::UnknownChangeType(other.to_string())),
        }
    }
}
