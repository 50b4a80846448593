use chrono::NaiveDate;
use rel_fabric::EventName;
use rel_ledger::{FieldChange, UnitOfWork};
use rel_types::{ChangeType, CustomerStatus, EntityType, IdGenerator, KycStatus, StatusValue};

use super::{load, metadata, snapshot, transition, HandlerContext};
use crate::error::{EngineError, EngineResult};
use crate::index;
use crate::model::{AuditStamp, Customer, Entity};
use crate::request::{CreateCustomerRequest, UpdateCustomerRequest, UpdateCustomerStatusRequest};

fn check_email(email: &str) -> EngineResult<()> {
    let plausible = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !plausible {
        return Err(EngineError::validation(format!("invalid email address {email:?}")));
    }
    Ok(())
}

fn check_date_of_birth(ctx: &HandlerContext<'_>, unit: &UnitOfWork<'_>, value: &str) -> EngineResult<()> {
    let born = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| EngineError::input(format!("dateOfBirth {value:?} is not YYYY-MM-DD: {e}")))?;
    let today = unit.anchor().to_datetime().date_naive();
    match today.years_since(born) {
        Some(age) if age >= ctx.config.min_customer_age => Ok(()),
        Some(age) => Err(EngineError::validation(format!(
            "customer must be at least {} years old, got {age}",
            ctx.config.min_customer_age
        ))),
        None => Err(EngineError::validation(format!("dateOfBirth {value} is in the future"))),
    }
}

pub fn create_customer(
    ctx: &HandlerContext<'_>,
    unit: &mut UnitOfWork<'_>,
    req: CreateCustomerRequest,
) -> EngineResult<Customer> {
    let email = req.email.trim();
    check_email(email)?;
    check_date_of_birth(ctx, unit, req.date_of_birth.trim())?;

    let customer = Customer {
        customer_id: IdGenerator::generate(EntityType::Customer.id_prefix()),
        entity_type: EntityType::Customer,
        first_name: req.first_name.trim().to_string(),
        last_name: req.last_name.trim().to_string(),
        email: email.to_string(),
        phone: req.phone.map(|p| p.trim().to_string()),
        date_of_birth: req.date_of_birth.trim().to_string(),
        address: req.address.trim().to_string(),
        status: CustomerStatus::Active,
        kyc_status: KycStatus::Pending,
        stamp: AuditStamp::new(unit.timestamp(), unit.actor()),
    };

    unit.put_json(&customer.primary_key(), &customer)?;
    index::put_status(unit, &customer)?;
    unit.record(
        &customer.customer_id,
        EntityType::Customer,
        ChangeType::Create,
        FieldChange::created("record", snapshot(&customer)?),
    )?;
    unit.emit(
        EventName::CustomerCreated,
        &customer.customer_id,
        EntityType::Customer,
        &customer,
        metadata([("kycStatus", customer.kyc_status.to_string())]),
    )?;
    Ok(customer)
}

pub fn update_customer(
    _ctx: &HandlerContext<'_>,
    unit: &mut UnitOfWork<'_>,
    req: UpdateCustomerRequest,
) -> EngineResult<Customer> {
    let mut customer: Customer = load(unit.txn(), req.customer_id.trim())?;
    if let Some(email) = &req.email {
        check_email(email.trim())?;
    }

    let mut changes = Vec::new();
    let mut apply = |field: &str, slot: &mut String, value: Option<String>| {
        if let Some(value) = value.map(|v| v.trim().to_string()) {
            if *slot != value {
                changes.push(FieldChange::new(field, &*slot, &value));
                *slot = value;
            }
        }
    };
    apply("firstName", &mut customer.first_name, req.first_name);
    apply("lastName", &mut customer.last_name, req.last_name);
    apply("email", &mut customer.email, req.email);
    apply("address", &mut customer.address, req.address);
    if let Some(phone) = req.phone.map(|p| p.trim().to_string()) {
        if customer.phone.as_deref() != Some(phone.as_str()) {
            changes.push(FieldChange::new(
                "phone",
                customer.phone.as_deref().unwrap_or_default(),
                &phone,
            ));
            customer.phone = Some(phone);
        }
    }

    if changes.is_empty() {
        return Err(EngineError::validation(format!(
            "update leaves customer {} unchanged",
            customer.customer_id
        )));
    }

    customer.stamp.touch(unit.timestamp(), unit.actor());
    unit.put_json(&customer.primary_key(), &customer)?;

    let changed_fields = changes
        .iter()
        .map(|c| c.field.as_str())
        .collect::<Vec<_>>()
        .join(",");
    for change in changes {
        unit.record(&customer.customer_id, EntityType::Customer, ChangeType::Update, change)?;
    }
    unit.emit(
        EventName::CustomerUpdated,
        &customer.customer_id,
        EntityType::Customer,
        &customer,
        metadata([("changedFields", changed_fields)]),
    )?;
    Ok(customer)
}

pub fn update_customer_status(
    ctx: &HandlerContext<'_>,
    unit: &mut UnitOfWork<'_>,
    req: UpdateCustomerStatusRequest,
) -> EngineResult<Customer> {
    let mut customer: Customer = load(unit.txn(), req.customer_id.trim())?;
    let previous = customer.status;
    customer.status = transition(ctx.registry, previous, req.status.trim())?;
    customer.stamp.touch(unit.timestamp(), unit.actor());

    unit.put_json(&customer.primary_key(), &customer)?;
    index::move_status(unit, &customer, previous.as_str())?;
    unit.record(
        &customer.customer_id,
        EntityType::Customer,
        ChangeType::StatusUpdate,
        FieldChange::new("status", previous, customer.status),
    )?;

    let mut meta = metadata([
        ("previousStatus", previous.to_string()),
        ("newStatus", customer.status.to_string()),
    ]);
    if let Some(reason) = req.reason {
        meta.insert("reason".into(), reason.trim().to_string());
    }
    unit.emit(
        EventName::CustomerStatusUpdated,
        &customer.customer_id,
        EntityType::Customer,
        &customer,
        meta,
    )?;
    Ok(customer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(check_email("ada@example.com").is_ok());
        for bad in ["ada", "@example.com", "ada@example", "ada@@example.com", "a da@example.com", "ada@.com"] {
            assert_eq!(check_email(bad).unwrap_err().kind(), "ValidationError", "{bad}");
        }
    }
}
