//! Stored entity records.
//!
//! Every record carries its immutable ID, its entity type, a status from that
//! type's declared set, and an [`AuditStamp`]. Records are stored as JSON
//! under `<TYPE_PREFIX>_<entityID>` and never physically deleted.

use std::fmt;
use std::str::FromStr;

use rel_types::{CaseStatus, CustomerStatus, EntityType, KycStatus, LoanStatus, StatusValue};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Creation and last-modification metadata shared by every record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStamp {
    pub created_at: String,
    pub last_updated_at: String,
    pub created_by: String,
    pub last_updated_by: String,
}

impl AuditStamp {
    pub fn new(timestamp: &str, actor: &str) -> Self {
        Self {
            created_at: timestamp.to_string(),
            last_updated_at: timestamp.to_string(),
            created_by: actor.to_string(),
            last_updated_by: actor.to_string(),
        }
    }

    pub fn touch(&mut self, timestamp: &str, actor: &str) {
        self.last_updated_at = timestamp.to_string();
        self.last_updated_by = actor.to_string();
    }
}

/// Loan products.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanType {
    Mortgage,
    Personal,
    Auto,
    Business,
}

impl LoanType {
    pub const ALL: [LoanType; 4] = [Self::Mortgage, Self::Personal, Self::Auto, Self::Business];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mortgage => "MORTGAGE",
            Self::Personal => "PERSONAL",
            Self::Auto => "AUTO",
            Self::Business => "BUSINESS",
        }
    }
}

/// Compliance case categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseType {
    Kyc,
    Aml,
    Sanctions,
}

impl CaseType {
    pub const ALL: [CaseType; 3] = [Self::Kyc, Self::Aml, Self::Sanctions];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kyc => "KYC",
            Self::Aml => "AML",
            Self::Sanctions => "SANCTIONS",
        }
    }
}

macro_rules! wire_enum {
    ($ty:ty, $what:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = EngineError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .into_iter()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| EngineError::input(format!("unknown {}: {s:?}", $what)))
            }
        }
    };
}

wire_enum!(LoanType, "loan type");
wire_enum!(CaseType, "case type");

/// A loan application.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    #[serde(rename = "loanID")]
    pub loan_id: String,
    pub entity_type: EntityType,
    #[serde(rename = "customerID")]
    pub customer_id: String,
    pub loan_type: LoanType,
    pub requested_amount: f64,
    pub term_months: u32,
    pub purpose: String,
    pub status: LoanStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(flatten)]
    pub stamp: AuditStamp,
}

/// A customer profile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[serde(rename = "customerID")]
    pub customer_id: String,
    pub entity_type: EntityType,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub date_of_birth: String,
    pub address: String,
    pub status: CustomerStatus,
    pub kyc_status: KycStatus,
    #[serde(flatten)]
    pub stamp: AuditStamp,
}

/// A KYC, AML, or sanctions compliance case.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceCase {
    #[serde(rename = "caseID")]
    pub case_id: String,
    pub entity_type: EntityType,
    #[serde(rename = "customerID")]
    pub customer_id: String,
    pub case_type: CaseType,
    pub description: String,
    pub status: CaseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub findings: Option<String>,
    #[serde(flatten)]
    pub stamp: AuditStamp,
}

/// A stored record of one entity type.
pub trait Entity: Serialize + serde::de::DeserializeOwned {
    const TYPE: EntityType;

    type Status: StatusValue;

    fn id(&self) -> &str;

    fn status(&self) -> Self::Status;

    /// Wire name of the current status.
    fn status_str(&self) -> &'static str {
        self.status().as_str()
    }

    fn primary_key(&self) -> String {
        Self::TYPE.primary_key(self.id())
    }
}

impl Entity for Loan {
    const TYPE: EntityType = EntityType::Loan;

    type Status = LoanStatus;

    fn id(&self) -> &str {
        &self.loan_id
    }

    fn status(&self) -> LoanStatus {
        self.status
    }
}

impl Entity for Customer {
    const TYPE: EntityType = EntityType::Customer;

    type Status = CustomerStatus;

    fn id(&self) -> &str {
        &self.customer_id
    }

    fn status(&self) -> CustomerStatus {
        self.status
    }
}

impl Entity for ComplianceCase {
    const TYPE: EntityType = EntityType::ComplianceCase;

    type Status = CaseStatus;

    fn id(&self) -> &str {
        &self.case_id
    }

    fn status(&self) -> CaseStatus {
        self.status
    }
}
