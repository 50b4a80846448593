use rel_fabric::EventName;
use rel_ledger::{FieldChange, UnitOfWork};
use rel_types::{ChangeType, CustomerStatus, EntityType, IdGenerator, LoanStatus, StatusValue};

use super::{load, metadata, money, snapshot, transition, HandlerContext};
use crate::error::{EngineError, EngineResult};
use crate::index;
use crate::model::{AuditStamp, Customer, Entity, Loan};
use crate::request::{
    ApproveLoanRequest, RejectLoanRequest, SubmitLoanRequest, UpdateLoanStatusRequest,
};

/// Fixed monthly payment of a fully amortising loan.
///
/// `annual_rate` is a percentage; a zero rate spreads the principal evenly.
pub fn monthly_payment(principal: f64, annual_rate: f64, term_months: u32) -> f64 {
    let n = f64::from(term_months);
    let r = annual_rate / 100.0 / 12.0;
    if r == 0.0 {
        return principal / n;
    }
    principal * r / (1.0 - (1.0 + r).powf(-n))
}

pub fn submit_loan(
    ctx: &HandlerContext<'_>,
    unit: &mut UnitOfWork<'_>,
    req: SubmitLoanRequest,
) -> EngineResult<Loan> {
    let limits = ctx.config.loans.limits(req.loan_type);
    if !(limits.min_amount..=limits.max_amount).contains(&req.requested_amount) {
        return Err(EngineError::validation(format!(
            "{} requested amount must be between {} and {}, got {}",
            req.loan_type,
            money(limits.min_amount),
            money(limits.max_amount),
            money(req.requested_amount)
        )));
    }
    if !(limits.min_term_months..=limits.max_term_months).contains(&req.term_months) {
        return Err(EngineError::validation(format!(
            "{} term must be between {} and {} months, got {}",
            req.loan_type, limits.min_term_months, limits.max_term_months, req.term_months
        )));
    }

    let customer: Customer = load(unit.txn(), req.customer_id.trim())?;
    if customer.status != CustomerStatus::Active {
        return Err(EngineError::validation(format!(
            "customer {} is {}, loans require an ACTIVE customer",
            customer.customer_id, customer.status
        )));
    }

    let loan = Loan {
        loan_id: IdGenerator::generate(EntityType::Loan.id_prefix()),
        entity_type: EntityType::Loan,
        customer_id: customer.customer_id,
        loan_type: req.loan_type,
        requested_amount: req.requested_amount,
        term_months: req.term_months,
        purpose: req.purpose.trim().to_string(),
        status: LoanStatus::Submitted,
        approved_amount: None,
        interest_rate: None,
        rejection_reason: None,
        stamp: AuditStamp::new(unit.timestamp(), unit.actor()),
    };

    unit.put_json(&loan.primary_key(), &loan)?;
    index::put_owner(unit, index::LOAN_BY_CUSTOMER, &loan.customer_id, &loan.loan_id)?;
    index::put_status(unit, &loan)?;
    unit.record(
        &loan.loan_id,
        EntityType::Loan,
        ChangeType::Create,
        FieldChange::created("record", snapshot(&loan)?),
    )?;
    unit.emit(
        EventName::LoanSubmitted,
        &loan.loan_id,
        EntityType::Loan,
        &loan,
        metadata([
            ("customerID", loan.customer_id.clone()),
            ("loanType", loan.loan_type.to_string()),
            ("requestedAmount", money(loan.requested_amount)),
        ]),
    )?;
    Ok(loan)
}

/// Move a loan along its lifecycle. Approval and rejection carry extra
/// fields and go through [`approve_loan`] and [`reject_loan`].
pub fn update_loan_status(
    ctx: &HandlerContext<'_>,
    unit: &mut UnitOfWork<'_>,
    req: UpdateLoanStatusRequest,
) -> EngineResult<Loan> {
    let mut loan: Loan = load(unit.txn(), req.loan_id.trim())?;
    let previous = loan.status;
    let next = transition(ctx.registry, previous, req.status.trim())?;
    match next {
        LoanStatus::Approved => {
            return Err(EngineError::validation("use ApproveLoan to approve a loan"))
        }
        LoanStatus::Rejected => {
            return Err(EngineError::validation("use RejectLoan to reject a loan"))
        }
        _ => {}
    }

    loan.status = next;
    loan.stamp.touch(unit.timestamp(), unit.actor());
    unit.put_json(&loan.primary_key(), &loan)?;
    index::move_status(unit, &loan, previous.as_str())?;
    unit.record(
        &loan.loan_id,
        EntityType::Loan,
        ChangeType::Update,
        FieldChange::new("status", previous, next),
    )?;

    let event = if next == LoanStatus::Disbursed {
        EventName::LoanDisbursed
    } else {
        EventName::LoanStatusUpdated
    };
    unit.emit(
        event,
        &loan.loan_id,
        EntityType::Loan,
        &loan,
        metadata([
            ("previousStatus", previous.to_string()),
            ("newStatus", next.to_string()),
        ]),
    )?;
    Ok(loan)
}

pub fn approve_loan(
    ctx: &HandlerContext<'_>,
    unit: &mut UnitOfWork<'_>,
    req: ApproveLoanRequest,
) -> EngineResult<Loan> {
    let mut loan: Loan = load(unit.txn(), req.loan_id.trim())?;
    let previous = loan.status;
    let next = transition(ctx.registry, previous, LoanStatus::Approved.as_str())?;

    if !(req.approved_amount > 0.0 && req.approved_amount <= loan.requested_amount) {
        return Err(EngineError::validation(format!(
            "approvedAmount must be positive and at most the requested {}, got {}",
            money(loan.requested_amount),
            money(req.approved_amount)
        )));
    }
    if !(req.interest_rate > 0.0 && req.interest_rate <= ctx.config.max_interest_rate) {
        return Err(EngineError::validation(format!(
            "interestRate must be in (0, {}], got {}",
            ctx.config.max_interest_rate, req.interest_rate
        )));
    }
    let term = req.term_months.unwrap_or(loan.term_months);
    let limits = ctx.config.loans.limits(loan.loan_type);
    if !(limits.min_term_months..=limits.max_term_months).contains(&term) {
        return Err(EngineError::validation(format!(
            "{} term must be between {} and {} months, got {term}",
            loan.loan_type, limits.min_term_months, limits.max_term_months
        )));
    }

    let changes = [
        FieldChange::new("status", previous, next),
        FieldChange::new(
            "approvedAmount",
            loan.approved_amount.map(money).unwrap_or_default(),
            money(req.approved_amount),
        ),
        FieldChange::new(
            "interestRate",
            loan.interest_rate.map(money).unwrap_or_default(),
            money(req.interest_rate),
        ),
        FieldChange::new("termMonths", loan.term_months, term),
    ];

    loan.status = next;
    loan.approved_amount = Some(req.approved_amount);
    loan.interest_rate = Some(req.interest_rate);
    loan.term_months = term;
    loan.stamp.touch(unit.timestamp(), unit.actor());

    unit.put_json(&loan.primary_key(), &loan)?;
    index::move_status(unit, &loan, previous.as_str())?;
    for change in changes {
        unit.record(&loan.loan_id, EntityType::Loan, ChangeType::Approve, change)?;
    }
    unit.emit(
        EventName::LoanApproved,
        &loan.loan_id,
        EntityType::Loan,
        &loan,
        metadata([
            ("approvedAmount", money(req.approved_amount)),
            ("interestRate", money(req.interest_rate)),
            ("termMonths", term.to_string()),
            (
                "monthlyPayment",
                money(monthly_payment(req.approved_amount, req.interest_rate, term)),
            ),
        ]),
    )?;
    Ok(loan)
}

pub fn reject_loan(
    ctx: &HandlerContext<'_>,
    unit: &mut UnitOfWork<'_>,
    req: RejectLoanRequest,
) -> EngineResult<Loan> {
    let mut loan: Loan = load(unit.txn(), req.loan_id.trim())?;
    let previous = loan.status;
    let next = transition(ctx.registry, previous, LoanStatus::Rejected.as_str())?;
    let reason = req.reason.trim().to_string();

    let changes = [
        FieldChange::new("status", previous, next),
        FieldChange::new(
            "rejectionReason",
            loan.rejection_reason.as_deref().unwrap_or_default(),
            &reason,
        ),
    ];

    loan.status = next;
    loan.rejection_reason = Some(reason.clone());
    loan.stamp.touch(unit.timestamp(), unit.actor());

    unit.put_json(&loan.primary_key(), &loan)?;
    index::move_status(unit, &loan, previous.as_str())?;
    for change in changes {
        unit.record(&loan.loan_id, EntityType::Loan, ChangeType::Reject, change)?;
    }
    unit.emit(
        EventName::LoanRejected,
        &loan.loan_id,
        EntityType::Loan,
        &loan,
        metadata([
            ("previousStatus", previous.to_string()),
            ("reason", reason),
        ]),
    )?;
    Ok(loan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amortised_payment() {
        // 95,000 at 3.75% over 30 years.
        let payment = monthly_payment(95_000.0, 3.75, 360);
        assert_eq!(money(payment), "439.96");
    }

    #[test]
    fn zero_rate_spreads_principal() {
        assert_eq!(monthly_payment(12_000.0, 0.0, 12), 1_000.0);
    }
}
