//! Per-entity-type status sets.
//!
//! The legal edges between these values live in `rel-lifecycle`; this module
//! only fixes the node sets so that a stored status can always be parsed back
//! into a member of its type's declared set.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entity::EntityType;
use crate::error::TypeError;

/// A status value belonging to one entity type's state set.
pub trait StatusValue: Copy + Eq + fmt::Display + FromStr<Err = TypeError> + 'static {
    /// The entity type this status set belongs to.
    const ENTITY: EntityType;

    /// Every member of the state set.
    fn all() -> &'static [Self];

    /// Canonical wire name.
    fn as_str(&self) -> &'static str;
}

fn parse_status<S: StatusValue>(value: &str) -> Result<S, TypeError> {
    S::all()
        .iter()
        .copied()
        .find(|s| s.as_str() == value)
        .ok_or_else(|| TypeError::UnknownStatus {
            entity_type: S::ENTITY.to_string(),
            value: value.to_string(),
        })
}

/// Loan application status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    Submitted,
    Underwriting,
    CreditApproval,
    Approved,
    Rejected,
    Disbursed,
}

impl StatusValue for LoanStatus {
    const ENTITY: EntityType = EntityType::Loan;

    fn all() -> &'static [Self] {
        &[
            Self::Submitted,
            Self::Underwriting,
            Self::CreditApproval,
            Self::Approved,
            Self::Rejected,
            Self::Disbursed,
        ]
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "SUBMITTED",
            Self::Underwriting => "UNDERWRITING",
            Self::CreditApproval => "CREDIT_APPROVAL",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Disbursed => "DISBURSED",
        }
    }
}

/// Customer profile status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerStatus {
    Active,
    Inactive,
    Suspended,
}

impl StatusValue for CustomerStatus {
    const ENTITY: EntityType = EntityType::Customer;

    fn all() -> &'static [Self] {
        &[Self::Active, Self::Inactive, Self::Suspended]
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
            Self::Suspended => "SUSPENDED",
        }
    }
}

/// Compliance case status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    Open,
    UnderReview,
    Cleared,
    Flagged,
    Escalated,
    Closed,
}

impl StatusValue for CaseStatus {
    const ENTITY: EntityType = EntityType::ComplianceCase;

    fn all() -> &'static [Self] {
        &[
            Self::Open,
            Self::UnderReview,
            Self::Cleared,
            Self::Flagged,
            Self::Escalated,
            Self::Closed,
        ]
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::UnderReview => "UNDER_REVIEW",
            Self::Cleared => "CLEARED",
            Self::Flagged => "FLAGGED",
            Self::Escalated => "ESCALATED",
            Self::Closed => "CLOSED",
        }
    }
}

macro_rules! status_display_and_parse {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(StatusValue::as_str(self))
                }
            }

            impl FromStr for $ty {
                type Err = TypeError;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    parse_status(s)
                }
            }
        )*
    };
}

status_display_and_parse!(LoanStatus, CustomerStatus, CaseStatus);

/// Customer KYC verification state. A plain field, not a lifecycle graph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KycStatus {
    #[default]
    Pending,
    Verified,
    Failed,
}

impl KycStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Verified => "VERIFIED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for KycStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_matches_serde_names() {
        for status in LoanStatus::all() {
            let json = serde_json::to_string(status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
            assert_eq!(status.as_str().parse::<LoanStatus>().unwrap(), *status);
        }
    }

    #[test]
    fn unknown_status_names_entity_type() {
        let err = "PENDING".parse::<CustomerStatus>().unwrap_err();
        assert_eq!(
            err,
            TypeError::UnknownStatus {
                entity_type: "CUSTOMER".into(),
                value: "PENDING".into(),
            }
        );
    }

    #[test]
    fn case_status_wire_names() {
        assert_eq!(CaseStatus::UnderReview.to_string(), "UNDER_REVIEW");
        assert_eq!(
            "ESCALATED".parse::<CaseStatus>().unwrap(),
            CaseStatus::Escalated
        );
    }

    #[test]
    fn kyc_defaults_to_pending() {
        assert_eq!(KycStatus::default(), KycStatus::Pending);
        assert_eq!(KycStatus::Verified.to_string(), "VERIFIED");
    }
}
