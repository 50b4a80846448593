//! JSON request bodies for write operations.
//!
//! A write operation takes exactly one positional argument: a JSON object
//! matching one of these types. [`parse_request`] decodes it and runs the
//! request's shape checks, so a request that reaches a handler has every
//! required field present and every number finite.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{EngineError, EngineResult};
use crate::model::{CaseType, LoanType};

/// A decoded write request.
pub trait Request: DeserializeOwned {
    /// Shape checks that need no ledger access.
    fn validate(&self) -> EngineResult<()>;
}

/// Decode the single JSON argument of a write operation.
pub fn parse_request<R: Request>(args: &[String]) -> EngineResult<R> {
    let body = match args {
        [body] => body,
        _ => {
            return Err(EngineError::input(format!(
                "expected one JSON request argument, got {}",
                args.len()
            )))
        }
    };
    if body.trim().is_empty() {
        return Err(EngineError::input("request body is empty"));
    }
    let request: R = serde_json::from_str(body)
        .map_err(|e| EngineError::input(format!("malformed request: {e}")))?;
    request.validate()?;
    Ok(request)
}

/// Trimmed value of a required text field.
pub fn require_text<'a>(field: &str, value: &'a str) -> EngineResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::input(format!("{field} is required")));
    }
    Ok(trimmed)
}

fn require_optional_text(field: &str, value: Option<&str>) -> EngineResult<()> {
    match value {
        Some(v) => require_text(field, v).map(|_| ()),
        None => Ok(()),
    }
}

fn require_finite(field: &str, value: f64) -> EngineResult<()> {
    if !value.is_finite() {
        return Err(EngineError::input(format!("{field} must be a finite number")));
    }
    Ok(())
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateCustomerRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    /// `YYYY-MM-DD`.
    pub date_of_birth: String,
    pub address: String,
}

impl Request for CreateCustomerRequest {
    fn validate(&self) -> EngineResult<()> {
        require_text("firstName", &self.first_name)?;
        require_text("lastName", &self.last_name)?;
        require_text("email", &self.email)?;
        require_text("dateOfBirth", &self.date_of_birth)?;
        require_text("address", &self.address)?;
        require_optional_text("phone", self.phone.as_deref())
    }
}

/// Partial profile update; absent fields are left unchanged.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateCustomerRequest {
    #[serde(rename = "customerID")]
    pub customer_id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl Request for UpdateCustomerRequest {
    fn validate(&self) -> EngineResult<()> {
        require_text("customerID", &self.customer_id)?;
        require_optional_text("firstName", self.first_name.as_deref())?;
        require_optional_text("lastName", self.last_name.as_deref())?;
        require_optional_text("email", self.email.as_deref())?;
        require_optional_text("phone", self.phone.as_deref())?;
        require_optional_text("address", self.address.as_deref())?;
        if self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.address.is_none()
        {
            return Err(EngineError::input("update names no fields"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateCustomerStatusRequest {
    #[serde(rename = "customerID")]
    pub customer_id: String,
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
}

impl Request for UpdateCustomerStatusRequest {
    fn validate(&self) -> EngineResult<()> {
        require_text("customerID", &self.customer_id)?;
        require_text("status", &self.status)?;
        require_optional_text("reason", self.reason.as_deref())
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SubmitLoanRequest {
    #[serde(rename = "customerID")]
    pub customer_id: String,
    pub loan_type: LoanType,
    pub requested_amount: f64,
    pub term_months: u32,
    pub purpose: String,
}

impl Request for SubmitLoanRequest {
    fn validate(&self) -> EngineResult<()> {
        require_text("customerID", &self.customer_id)?;
        require_text("purpose", &self.purpose)?;
        require_finite("requestedAmount", self.requested_amount)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateLoanStatusRequest {
    #[serde(rename = "loanID")]
    pub loan_id: String,
    pub status: String,
}

impl Request for UpdateLoanStatusRequest {
    fn validate(&self) -> EngineResult<()> {
        require_text("loanID", &self.loan_id)?;
        require_text("status", &self.status).map(|_| ())
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ApproveLoanRequest {
    #[serde(rename = "loanID")]
    pub loan_id: String,
    pub approved_amount: f64,
    /// Annual percentage rate.
    pub interest_rate: f64,
    /// Overrides the requested term when present.
    #[serde(default)]
    pub term_months: Option<u32>,
}

impl Request for ApproveLoanRequest {
    fn validate(&self) -> EngineResult<()> {
        require_text("loanID", &self.loan_id)?;
        require_finite("approvedAmount", self.approved_amount)?;
        require_finite("interestRate", self.interest_rate)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RejectLoanRequest {
    #[serde(rename = "loanID")]
    pub loan_id: String,
    pub reason: String,
}

impl Request for RejectLoanRequest {
    fn validate(&self) -> EngineResult<()> {
        require_text("loanID", &self.loan_id)?;
        require_text("reason", &self.reason).map(|_| ())
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OpenCaseRequest {
    #[serde(rename = "customerID")]
    pub customer_id: String,
    pub case_type: CaseType,
    pub description: String,
    #[serde(default)]
    pub assigned_to: Option<String>,
}

impl Request for OpenCaseRequest {
    fn validate(&self) -> EngineResult<()> {
        require_text("customerID", &self.customer_id)?;
        require_text("description", &self.description)?;
        require_optional_text("assignedTo", self.assigned_to.as_deref())
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateCaseStatusRequest {
    #[serde(rename = "caseID")]
    pub case_id: String,
    pub status: String,
    #[serde(default)]
    pub findings: Option<String>,
}

impl Request for UpdateCaseStatusRequest {
    fn validate(&self) -> EngineResult<()> {
        require_text("caseID", &self.case_id)?;
        require_text("status", &self.status)?;
        require_optional_text("findings", self.findings.as_deref())
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RecordKycResultRequest {
    #[serde(rename = "caseID")]
    pub case_id: String,
    pub verified: bool,
    #[serde(default)]
    pub findings: Option<String>,
}

impl Request for RecordKycResultRequest {
    fn validate(&self) -> EngineResult<()> {
        require_text("caseID", &self.case_id)?;
        require_optional_text("findings", self.findings.as_deref())
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RecordAmlCheckRequest {
    #[serde(rename = "caseID")]
    pub case_id: String,
    /// 0 (no risk) to 100.
    pub risk_score: f64,
    #[serde(default)]
    pub findings: Option<String>,
}

impl Request for RecordAmlCheckRequest {
    fn validate(&self) -> EngineResult<()> {
        require_text("caseID", &self.case_id)?;
        require_finite("riskScore", self.risk_score)?;
        require_optional_text("findings", self.findings.as_deref())
    }
}
