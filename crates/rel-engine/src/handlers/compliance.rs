use rel_fabric::EventName;
use rel_ledger::{FieldChange, UnitOfWork};
use rel_types::{CaseStatus, ChangeType, EntityType, IdGenerator, KycStatus, StatusValue};

use super::{load, metadata, money, snapshot, transition, HandlerContext};
use crate::error::{EngineError, EngineResult};
use crate::index;
use crate::model::{AuditStamp, CaseType, ComplianceCase, Customer, Entity};
use crate::request::{
    OpenCaseRequest, RecordAmlCheckRequest, RecordKycResultRequest, UpdateCaseStatusRequest,
};

/// Load a case that must be of `case_type` and currently under review.
fn load_reviewable(
    unit: &UnitOfWork<'_>,
    case_id: &str,
    case_type: CaseType,
) -> EngineResult<ComplianceCase> {
    let case: ComplianceCase = load(unit.txn(), case_id)?;
    if case.case_type != case_type {
        return Err(EngineError::validation(format!(
            "case {} is a {} case, expected {case_type}",
            case.case_id, case.case_type
        )));
    }
    if case.status != CaseStatus::UnderReview {
        return Err(EngineError::validation(format!(
            "case {} is {}, results apply only to cases UNDER_REVIEW",
            case.case_id, case.status
        )));
    }
    Ok(case)
}

/// Move `case` to `next` and apply new findings, returning the history
/// changes in recording order.
fn advance(
    ctx: &HandlerContext<'_>,
    unit: &UnitOfWork<'_>,
    case: &mut ComplianceCase,
    next: &str,
    findings: Option<String>,
) -> EngineResult<Vec<(ChangeType, FieldChange)>> {
    let previous = case.status;
    case.status = transition(ctx.registry, previous, next)?;

    let mut changes = vec![(
        ChangeType::StatusUpdate,
        FieldChange::new("status", previous, case.status),
    )];
    if let Some(findings) = findings.map(|f| f.trim().to_string()) {
        if case.findings.as_deref() != Some(findings.as_str()) {
            changes.push((
                ChangeType::Update,
                FieldChange::new(
                    "findings",
                    case.findings.as_deref().unwrap_or_default(),
                    &findings,
                ),
            ));
            case.findings = Some(findings);
        }
    }
    case.stamp.touch(unit.timestamp(), unit.actor());
    Ok(changes)
}

/// Persist a revised case, move its status index entry, and record `changes`.
fn store_case(
    unit: &mut UnitOfWork<'_>,
    case: &ComplianceCase,
    previous: CaseStatus,
    changes: Vec<(ChangeType, FieldChange)>,
) -> EngineResult<()> {
    unit.put_json(&case.primary_key(), case)?;
    index::move_status(unit, case, previous.as_str())?;
    for (change_type, change) in changes {
        unit.record(&case.case_id, EntityType::ComplianceCase, change_type, change)?;
    }
    Ok(())
}

pub fn open_case(
    _ctx: &HandlerContext<'_>,
    unit: &mut UnitOfWork<'_>,
    req: OpenCaseRequest,
) -> EngineResult<ComplianceCase> {
    let customer: Customer = load(unit.txn(), req.customer_id.trim())?;

    let case = ComplianceCase {
        case_id: IdGenerator::generate(EntityType::ComplianceCase.id_prefix()),
        entity_type: EntityType::ComplianceCase,
        customer_id: customer.customer_id,
        case_type: req.case_type,
        description: req.description.trim().to_string(),
        status: CaseStatus::Open,
        assigned_to: req.assigned_to.map(|a| a.trim().to_string()),
        risk_score: None,
        findings: None,
        stamp: AuditStamp::new(unit.timestamp(), unit.actor()),
    };

    unit.put_json(&case.primary_key(), &case)?;
    index::put_owner(unit, index::CASE_BY_CUSTOMER, &case.customer_id, &case.case_id)?;
    index::put_status(unit, &case)?;
    unit.record(
        &case.case_id,
        EntityType::ComplianceCase,
        ChangeType::Create,
        FieldChange::created("record", snapshot(&case)?),
    )?;
    unit.emit(
        EventName::ComplianceCaseOpened,
        &case.case_id,
        EntityType::ComplianceCase,
        &case,
        metadata([
            ("customerID", case.customer_id.clone()),
            ("caseType", case.case_type.to_string()),
        ]),
    )?;
    Ok(case)
}

pub fn update_case_status(
    ctx: &HandlerContext<'_>,
    unit: &mut UnitOfWork<'_>,
    req: UpdateCaseStatusRequest,
) -> EngineResult<ComplianceCase> {
    let mut case: ComplianceCase = load(unit.txn(), req.case_id.trim())?;
    let previous = case.status;
    let changes = advance(ctx, unit, &mut case, req.status.trim(), req.findings)?;
    store_case(unit, &case, previous, changes)?;

    unit.emit(
        EventName::ComplianceCaseUpdated,
        &case.case_id,
        EntityType::ComplianceCase,
        &case,
        metadata([
            ("previousStatus", previous.to_string()),
            ("newStatus", case.status.to_string()),
        ]),
    )?;
    Ok(case)
}

/// Close out a KYC review: the case is CLEARED or FLAGGED and the customer's
/// KYC status becomes VERIFIED or FAILED in the same unit of work.
pub fn record_kyc_result(
    ctx: &HandlerContext<'_>,
    unit: &mut UnitOfWork<'_>,
    req: RecordKycResultRequest,
) -> EngineResult<ComplianceCase> {
    let mut case = load_reviewable(unit, req.case_id.trim(), CaseType::Kyc)?;
    let mut customer: Customer = load(unit.txn(), &case.customer_id)?;

    let (next, kyc, event) = if req.verified {
        (CaseStatus::Cleared, KycStatus::Verified, EventName::KycVerified)
    } else {
        (CaseStatus::Flagged, KycStatus::Failed, EventName::KycFailed)
    };

    let previous = case.status;
    let changes = advance(ctx, unit, &mut case, next.as_str(), req.findings)?;
    store_case(unit, &case, previous, changes)?;

    let previous_kyc = customer.kyc_status;
    customer.kyc_status = kyc;
    customer.stamp.touch(unit.timestamp(), unit.actor());
    unit.put_json(&customer.primary_key(), &customer)?;
    unit.record(
        &customer.customer_id,
        EntityType::Customer,
        ChangeType::Update,
        FieldChange::new("kycStatus", previous_kyc, kyc),
    )?;

    unit.emit(
        event,
        &case.case_id,
        EntityType::ComplianceCase,
        &case,
        metadata([
            ("customerID", customer.customer_id.clone()),
            ("kycStatus", kyc.to_string()),
            ("caseStatus", case.status.to_string()),
        ]),
    )?;
    Ok(case)
}

/// Record an AML risk score. Scores at or above the configured threshold
/// flag the case; lower scores clear it.
pub fn record_aml_check(
    ctx: &HandlerContext<'_>,
    unit: &mut UnitOfWork<'_>,
    req: RecordAmlCheckRequest,
) -> EngineResult<ComplianceCase> {
    if !(0.0..=100.0).contains(&req.risk_score) {
        return Err(EngineError::validation(format!(
            "riskScore must be between 0 and 100, got {}",
            req.risk_score
        )));
    }
    let mut case = load_reviewable(unit, req.case_id.trim(), CaseType::Aml)?;

    let threshold = ctx.config.aml_risk_threshold;
    let (next, event) = if req.risk_score >= threshold {
        (CaseStatus::Flagged, EventName::AmlFlagged)
    } else {
        (CaseStatus::Cleared, EventName::AmlCheckCompleted)
    };

    let previous = case.status;
    let mut changes = advance(ctx, unit, &mut case, next.as_str(), req.findings)?;
    changes.push((
        ChangeType::Update,
        FieldChange::new(
            "riskScore",
            case.risk_score.map(money).unwrap_or_default(),
            money(req.risk_score),
        ),
    ));
    case.risk_score = Some(req.risk_score);
    store_case(unit, &case, previous, changes)?;

    unit.emit(
        event,
        &case.case_id,
        EntityType::ComplianceCase,
        &case,
        metadata([
            ("customerID", case.customer_id.clone()),
            ("riskScore", money(req.risk_score)),
            ("threshold", money(threshold)),
            ("caseStatus", case.status.to_string()),
        ]),
    )?;
    Ok(case)
}
