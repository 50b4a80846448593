use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use rel_fabric::{decode_committed, CommittedEvent, EventFabric, EventFilter, EventStream};
use rel_ledger::{AuditReport, AuditValidator, HistoryEntry, Ledger, UnitOfWork};
use rel_lifecycle::GraphRegistry;
use rel_store::{CommitRecord, InMemoryStateStore, StateStore, WalConfig, WalStateStore};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::handlers::{compliance, customer, loan, query, HandlerContext};
use crate::model::{ComplianceCase, Customer, Loan};
use crate::request::{parse_request, Request};

/// Invocable functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Function {
    CreateCustomer,
    UpdateCustomer,
    UpdateCustomerStatus,
    GetCustomer,
    QueryCustomersByStatus,
    SubmitLoanApplication,
    UpdateLoanStatus,
    ApproveLoan,
    RejectLoan,
    GetLoan,
    QueryLoansByStatus,
    QueryLoansByCustomer,
    OpenComplianceCase,
    UpdateCaseStatus,
    RecordKycResult,
    RecordAmlCheck,
    GetComplianceCase,
    QueryCasesByCustomer,
    QueryCasesByStatus,
    GetHistory,
}

impl Function {
    pub const ALL: [Function; 20] = [
        Self::CreateCustomer,
        Self::UpdateCustomer,
        Self::UpdateCustomerStatus,
        Self::GetCustomer,
        Self::QueryCustomersByStatus,
        Self::SubmitLoanApplication,
        Self::UpdateLoanStatus,
        Self::ApproveLoan,
        Self::RejectLoan,
        Self::GetLoan,
        Self::QueryLoansByStatus,
        Self::QueryLoansByCustomer,
        Self::OpenComplianceCase,
        Self::UpdateCaseStatus,
        Self::RecordKycResult,
        Self::RecordAmlCheck,
        Self::GetComplianceCase,
        Self::QueryCasesByCustomer,
        Self::QueryCasesByStatus,
        Self::GetHistory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateCustomer => "CreateCustomer",
            Self::UpdateCustomer => "UpdateCustomer",
            Self::UpdateCustomerStatus => "UpdateCustomerStatus",
            Self::GetCustomer => "GetCustomer",
            Self::QueryCustomersByStatus => "QueryCustomersByStatus",
            Self::SubmitLoanApplication => "SubmitLoanApplication",
            Self::UpdateLoanStatus => "UpdateLoanStatus",
            Self::ApproveLoan => "ApproveLoan",
            Self::RejectLoan => "RejectLoan",
            Self::GetLoan => "GetLoan",
            Self::QueryLoansByStatus => "QueryLoansByStatus",
            Self::QueryLoansByCustomer => "QueryLoansByCustomer",
            Self::OpenComplianceCase => "OpenComplianceCase",
            Self::UpdateCaseStatus => "UpdateCaseStatus",
            Self::RecordKycResult => "RecordKYCResult",
            Self::RecordAmlCheck => "RecordAMLCheck",
            Self::GetComplianceCase => "GetComplianceCase",
            Self::QueryCasesByCustomer => "QueryCasesByCustomer",
            Self::QueryCasesByStatus => "QueryCasesByStatus",
            Self::GetHistory => "GetHistory",
        }
    }

    /// Queries take raw positional strings and never write.
    pub fn is_query(&self) -> bool {
        matches!(
            self,
            Self::GetCustomer
                | Self::QueryCustomersByStatus
                | Self::GetLoan
                | Self::QueryLoansByStatus
                | Self::QueryLoansByCustomer
                | Self::GetComplianceCase
                | Self::QueryCasesByCustomer
                | Self::QueryCasesByStatus
                | Self::GetHistory
        )
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Function {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| EngineError::input(format!("unknown function {s:?}")))
    }
}

fn to_value<T: Serialize>(value: &T) -> EngineResult<Value> {
    serde_json::to_value(value).map_err(|e| EngineError::Persistence(e.to_string()))
}

/// The single positional argument of a query.
fn query_arg(function: Function, args: &[String]) -> EngineResult<&str> {
    match args {
        [arg] if !arg.trim().is_empty() => Ok(arg.as_str()),
        [_] => Err(EngineError::input(format!("{function} argument is empty"))),
        _ => Err(EngineError::input(format!(
            "{function} takes one argument, got {}",
            args.len()
        ))),
    }
}

/// The entity-lifecycle engine: dispatches invocations to handlers and
/// commits each mutation as one unit of work.
pub struct Engine {
    ledger: Ledger,
    registry: GraphRegistry,
    config: EngineConfig,
}

impl Engine {
    /// Engine over a fresh in-memory store.
    pub fn in_memory(config: EngineConfig) -> EngineResult<Self> {
        Self::with_store(Arc::new(InMemoryStateStore::new()), config)
    }

    /// Engine over the write-ahead log in `dir`, replaying committed state.
    pub fn open(dir: &Path, config: EngineConfig) -> EngineResult<Self> {
        let wal = WalConfig {
            sync_mode: config.storage.sync_mode,
        };
        let store = WalStateStore::open(dir, wal)?;
        Self::with_store(Arc::new(store), config)
    }

    pub fn with_store(store: Arc<dyn StateStore>, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let registry =
            GraphRegistry::standard().map_err(|e| EngineError::Config(e.to_string()))?;
        let fabric = Arc::new(EventFabric::new(config.events.clone()));
        let ledger = Ledger::new(store, fabric, config.node_id)?;
        info!(
            node_id = config.node_id,
            graphs = registry.entity_types().count(),
            "engine ready"
        );
        Ok(Self {
            ledger,
            registry,
            config,
        })
    }

    /// Run `function` on behalf of `actor`.
    ///
    /// Returns the serialized entity for writes and single lookups, and a
    /// JSON array for multi-result queries.
    pub fn invoke(&self, actor: &str, function: Function, args: &[String]) -> EngineResult<Value> {
        debug!(%function, actor, args = args.len(), "invoke");
        let result = if function.is_query() {
            self.query(function, args)
        } else {
            self.mutate(actor, function, args)
        };
        if let Err(err) = &result {
            warn!(%function, actor, kind = err.kind(), error = %err, "invocation failed");
        }
        result
    }

    /// Invoke by function name and render the response, or the structured
    /// error, as JSON text.
    pub fn invoke_json(&self, actor: &str, function: &str, args: &[String]) -> String {
        let response = function
            .parse::<Function>()
            .and_then(|f| self.invoke(actor, f, args));
        match response {
            Ok(value) => value.to_string(),
            Err(err) => err.to_json().to_string(),
        }
    }

    fn query(&self, function: Function, args: &[String]) -> EngineResult<Value> {
        let arg = query_arg(function, args)?;
        let txn = self.ledger.snapshot();
        match function {
            Function::GetCustomer => to_value(&query::get::<Customer>(&txn, arg)?),
            Function::GetLoan => to_value(&query::get::<Loan>(&txn, arg)?),
            Function::GetComplianceCase => to_value(&query::get::<ComplianceCase>(&txn, arg)?),
            Function::QueryCustomersByStatus => to_value(&query::by_status::<Customer>(&txn, arg)?),
            Function::QueryLoansByStatus => to_value(&query::by_status::<Loan>(&txn, arg)?),
            Function::QueryCasesByStatus => {
                to_value(&query::by_status::<ComplianceCase>(&txn, arg)?)
            }
            Function::QueryLoansByCustomer => to_value(&query::by_customer::<Loan>(&txn, arg)?),
            Function::QueryCasesByCustomer => {
                to_value(&query::by_customer::<ComplianceCase>(&txn, arg)?)
            }
            Function::GetHistory => to_value(&query::history(&txn, arg)?),
            _ => Err(EngineError::input(format!("{function} is not a query"))),
        }
    }

    fn mutate(&self, actor: &str, function: Function, args: &[String]) -> EngineResult<Value> {
        match function {
            Function::CreateCustomer => self.run(actor, function, args, customer::create_customer),
            Function::UpdateCustomer => self.run(actor, function, args, customer::update_customer),
            Function::UpdateCustomerStatus => {
                self.run(actor, function, args, customer::update_customer_status)
            }
            Function::SubmitLoanApplication => self.run(actor, function, args, loan::submit_loan),
            Function::UpdateLoanStatus => self.run(actor, function, args, loan::update_loan_status),
            Function::ApproveLoan => self.run(actor, function, args, loan::approve_loan),
            Function::RejectLoan => self.run(actor, function, args, loan::reject_loan),
            Function::OpenComplianceCase => self.run(actor, function, args, compliance::open_case),
            Function::UpdateCaseStatus => {
                self.run(actor, function, args, compliance::update_case_status)
            }
            Function::RecordKycResult => {
                self.run(actor, function, args, compliance::record_kyc_result)
            }
            Function::RecordAmlCheck => self.run(actor, function, args, compliance::record_aml_check),
            _ => Err(EngineError::input(format!("{function} is not a write operation"))),
        }
    }

    /// Decode the request, run the handler in a fresh unit of work, and
    /// commit. A handler error drops the unit without writing anything.
    fn run<R, T, F>(&self, actor: &str, function: Function, args: &[String], handler: F) -> EngineResult<Value>
    where
        R: Request,
        T: Serialize,
        F: FnOnce(&HandlerContext<'_>, &mut UnitOfWork<'_>, R) -> EngineResult<T>,
    {
        let request: R = parse_request(args)?;
        let ctx = HandlerContext {
            registry: &self.registry,
            config: &self.config,
        };
        let mut unit = self.ledger.begin(actor)?;
        let entity = handler(&ctx, &mut unit, request)?;
        let receipt = self.ledger.commit(unit)?;
        info!(
            %function,
            seq = receipt.seq,
            tx_id = %receipt.tx_id,
            history = receipt.history.len(),
            "invocation committed"
        );
        to_value(&entity)
    }

    /// Creation-ordered history of an entity.
    pub fn history(&self, entity_id: &str) -> EngineResult<Vec<HistoryEntry>> {
        query::history(&self.ledger.snapshot(), entity_id)
    }

    /// Subscribe to committed change events.
    pub fn subscribe(&self, filter: EventFilter) -> EventStream {
        self.ledger.fabric().subscribe(filter)
    }

    /// Committed transactions from `from_seq`, oldest first, at most `limit`.
    pub fn log(&self, from_seq: u64, limit: usize) -> EngineResult<Vec<CommitRecord>> {
        let mut commits = self.ledger.commits(from_seq)?;
        commits.truncate(limit);
        Ok(commits)
    }

    /// Events of a committed transaction, decoded.
    pub fn events_of(&self, record: &CommitRecord) -> EngineResult<Vec<CommittedEvent>> {
        decode_committed(record).map_err(|e| EngineError::Persistence(e.to_string()))
    }

    /// Validate every history stream.
    pub fn verify(&self) -> EngineResult<AuditReport> {
        Ok(AuditValidator::validate_all(&self.ledger)?)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn registry(&self) -> &GraphRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("node_id", &self.config.node_id)
            .field("graphs", &self.registry.entity_types().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rel_fabric::EventName;
    use rel_types::{ChangeType, EntityType};
    use serde_json::json;

    const ACTOR: &str = "officer-1";

    fn engine() -> Engine {
        Engine::in_memory(EngineConfig::default()).unwrap()
    }

    fn call(engine: &Engine, function: Function, body: Value) -> EngineResult<Value> {
        engine.invoke(ACTOR, function, &[body.to_string()])
    }

    fn ask(engine: &Engine, function: Function, arg: &str) -> EngineResult<Value> {
        engine.invoke(ACTOR, function, &[arg.to_string()])
    }

    fn id_of(value: &Value, field: &str) -> String {
        value[field].as_str().unwrap().to_string()
    }

    fn create_customer(engine: &Engine) -> String {
        let customer = call(
            engine,
            Function::CreateCustomer,
            json!({
                "firstName": "Ada",
                "lastName": "Lovelace",
                "email": "ada@example.com",
                "dateOfBirth": "1980-04-01",
                "address": "12 St James's Square, London"
            }),
        )
        .unwrap();
        id_of(&customer, "customerID")
    }

    fn submit_mortgage(engine: &Engine, customer_id: &str) -> String {
        let loan = call(
            engine,
            Function::SubmitLoanApplication,
            json!({
                "customerID": customer_id,
                "loanType": "MORTGAGE",
                "requestedAmount": 100000,
                "termMonths": 360,
                "purpose": "primary residence"
            }),
        )
        .unwrap();
        id_of(&loan, "loanID")
    }

    fn set_loan_status(engine: &Engine, loan_id: &str, status: &str) -> EngineResult<Value> {
        call(
            engine,
            Function::UpdateLoanStatus,
            json!({"loanID": loan_id, "status": status}),
        )
    }

    fn open_case(engine: &Engine, customer_id: &str, case_type: &str) -> String {
        let case = call(
            engine,
            Function::OpenComplianceCase,
            json!({"customerID": customer_id, "caseType": case_type, "description": "onboarding review"}),
        )
        .unwrap();
        let case_id = id_of(&case, "caseID");
        call(
            engine,
            Function::UpdateCaseStatus,
            json!({"caseID": case_id, "status": "UNDER_REVIEW"}),
        )
        .unwrap();
        case_id
    }

    fn ids(value: &Value, field: &str) -> Vec<String> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| id_of(v, field))
            .collect()
    }

    #[test]
    fn mortgage_lifecycle_scenario() {
        let engine = engine();
        let customer_id = create_customer(&engine);

        // Submit.
        let loan_id = submit_mortgage(&engine, &customer_id);
        let loan = ask(&engine, Function::GetLoan, &loan_id).unwrap();
        assert_eq!(loan["status"], "SUBMITTED");
        let history = engine.history(&loan_id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].change_type, ChangeType::Create);
        assert_eq!(history[0].actor_id, ACTOR);

        // SUBMITTED -> UNDERWRITING.
        set_loan_status(&engine, &loan_id, "UNDERWRITING").unwrap();
        let history = engine.history(&loan_id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].change_type, ChangeType::Update);
        assert_eq!(history[1].field_name, "status");
        assert_eq!(history[1].previous_value, "SUBMITTED");
        assert_eq!(history[1].new_value, "UNDERWRITING");
        assert_eq!(history[1].entity_id, loan_id);

        // SUBMITTED -> DISBURSED on a fresh loan.
        let fresh_id = submit_mortgage(&engine, &customer_id);
        let before = ask(&engine, Function::GetLoan, &fresh_id).unwrap();
        let err = set_loan_status(&engine, &fresh_id, "DISBURSED").unwrap_err();
        assert_eq!(err.kind(), "TransitionError");
        assert_eq!(engine.history(&fresh_id).unwrap().len(), 1);
        assert_eq!(ask(&engine, Function::GetLoan, &fresh_id).unwrap(), before);

        // CREDIT_APPROVAL -> APPROVED.
        set_loan_status(&engine, &loan_id, "CREDIT_APPROVAL").unwrap();
        let mut approvals = engine.subscribe(EventFilter {
            names: Some(vec![EventName::LoanApproved]),
            ..Default::default()
        });
        let approved = call(
            &engine,
            Function::ApproveLoan,
            json!({"loanID": loan_id, "approvedAmount": 95000, "interestRate": 3.75}),
        )
        .unwrap();
        assert_eq!(approved["status"], "APPROVED");
        assert_eq!(approved["approvedAmount"], 95000.0);

        let history = engine.history(&loan_id).unwrap();
        let new_entries = &history[3..];
        assert!(new_entries.len() >= 4);
        let fields: Vec<&str> = new_entries.iter().map(|e| e.field_name.as_str()).collect();
        assert_eq!(fields, ["status", "approvedAmount", "interestRate", "termMonths"]);
        assert!(new_entries.iter().all(|e| e.change_type == ChangeType::Approve));
        assert!(new_entries
            .iter()
            .all(|e| e.transaction_id == new_entries[0].transaction_id));
        assert_eq!(new_entries[1].new_value, "95000.00");
        assert_eq!(new_entries[3].previous_value, "360");

        let event = approvals.try_recv().unwrap();
        assert_eq!(event.event.entity_id, loan_id);
        assert_eq!(event.tx_id, new_entries[0].transaction_id);
        assert_eq!(event.event.metadata["approvedAmount"], "95000.00");
        assert_eq!(event.event.metadata["interestRate"], "3.75");
        assert_eq!(event.event.metadata["monthlyPayment"], "439.96");
        assert_eq!(event.event.data["status"], "APPROVED");

        // APPROVED -> DISBURSED, then terminal.
        let mut disbursals = engine.subscribe(EventFilter {
            names: Some(vec![EventName::LoanDisbursed]),
            ..Default::default()
        });
        set_loan_status(&engine, &loan_id, "DISBURSED").unwrap();
        assert!(disbursals.try_recv().is_ok());
        let err = set_loan_status(&engine, &loan_id, "UNDERWRITING").unwrap_err();
        assert_eq!(err.kind(), "TransitionError");

        assert!(engine.verify().unwrap().is_valid());
    }

    #[test]
    fn approval_and_rejection_go_through_their_own_operations() {
        let engine = engine();
        let customer_id = create_customer(&engine);
        let loan_id = submit_mortgage(&engine, &customer_id);
        set_loan_status(&engine, &loan_id, "UNDERWRITING").unwrap();
        set_loan_status(&engine, &loan_id, "CREDIT_APPROVAL").unwrap();

        let err = set_loan_status(&engine, &loan_id, "APPROVED").unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
        let err = set_loan_status(&engine, &loan_id, "REJECTED").unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
        let err = set_loan_status(&engine, &loan_id, "PENDING").unwrap_err();
        assert_eq!(err.kind(), "TransitionError");
        assert_eq!(engine.history(&loan_id).unwrap().len(), 3);
    }

    #[test]
    fn approval_rules() {
        let engine = engine();
        let customer_id = create_customer(&engine);
        let loan_id = submit_mortgage(&engine, &customer_id);

        // Not yet in CREDIT_APPROVAL.
        let err = call(
            &engine,
            Function::ApproveLoan,
            json!({"loanID": loan_id, "approvedAmount": 1000, "interestRate": 5}),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "TransitionError");

        set_loan_status(&engine, &loan_id, "UNDERWRITING").unwrap();
        set_loan_status(&engine, &loan_id, "CREDIT_APPROVAL").unwrap();
        for body in [
            json!({"loanID": loan_id, "approvedAmount": 150000, "interestRate": 5}),
            json!({"loanID": loan_id, "approvedAmount": 0, "interestRate": 5}),
            json!({"loanID": loan_id, "approvedAmount": 1000, "interestRate": 0}),
            json!({"loanID": loan_id, "approvedAmount": 1000, "interestRate": 30}),
            json!({"loanID": loan_id, "approvedAmount": 1000, "interestRate": 5, "termMonths": 12}),
        ] {
            let err = call(&engine, Function::ApproveLoan, body.clone()).unwrap_err();
            assert_eq!(err.kind(), "ValidationError", "{body}");
        }
        assert_eq!(engine.history(&loan_id).unwrap().len(), 3);

        let approved = call(
            &engine,
            Function::ApproveLoan,
            json!({"loanID": loan_id, "approvedAmount": 80000, "interestRate": 4.5, "termMonths": 240}),
        )
        .unwrap();
        assert_eq!(approved["termMonths"], 240);
    }

    #[test]
    fn rejection_records_status_and_reason() {
        let engine = engine();
        let customer_id = create_customer(&engine);
        let loan_id = submit_mortgage(&engine, &customer_id);
        let mut rejections = engine.subscribe(EventFilter::default());

        let rejected = call(
            &engine,
            Function::RejectLoan,
            json!({"loanID": loan_id, "reason": "insufficient income"}),
        )
        .unwrap();
        assert_eq!(rejected["status"], "REJECTED");
        assert_eq!(rejected["rejectionReason"], "insufficient income");

        let history = engine.history(&loan_id).unwrap();
        assert_eq!(history.len(), 3);
        assert!(history[1..].iter().all(|e| e.change_type == ChangeType::Reject));
        assert_eq!(history[2].field_name, "rejectionReason");
        assert_eq!(history[2].previous_value, "");

        let event = rejections.try_recv().unwrap();
        assert_eq!(event.event.event_type, EventName::LoanRejected);
        assert_eq!(event.event.metadata["reason"], "insufficient income");

        let err = call(&engine, Function::RejectLoan, json!({"loanID": loan_id, "reason": "again"}))
            .unwrap_err();
        assert_eq!(err.kind(), "TransitionError");
    }

    #[test]
    fn loan_submission_rules() {
        let engine = engine();
        let customer_id = create_customer(&engine);

        let too_small = json!({
            "customerID": customer_id, "loanType": "PERSONAL",
            "requestedAmount": 500, "termMonths": 12, "purpose": "bike"
        });
        assert_eq!(
            call(&engine, Function::SubmitLoanApplication, too_small).unwrap_err().kind(),
            "ValidationError"
        );
        let too_long = json!({
            "customerID": customer_id, "loanType": "AUTO",
            "requestedAmount": 20000, "termMonths": 120, "purpose": "car"
        });
        assert_eq!(
            call(&engine, Function::SubmitLoanApplication, too_long).unwrap_err().kind(),
            "ValidationError"
        );

        let stranger = rel_types::IdGenerator::generate("CUST");
        let orphan = json!({
            "customerID": stranger, "loanType": "AUTO",
            "requestedAmount": 20000, "termMonths": 48, "purpose": "car"
        });
        assert_eq!(
            call(&engine, Function::SubmitLoanApplication, orphan).unwrap_err().kind(),
            "NotFoundError"
        );

        call(
            &engine,
            Function::UpdateCustomerStatus,
            json!({"customerID": customer_id, "status": "SUSPENDED", "reason": "fraud review"}),
        )
        .unwrap();
        let suspended = json!({
            "customerID": customer_id, "loanType": "AUTO",
            "requestedAmount": 20000, "termMonths": 48, "purpose": "car"
        });
        assert_eq!(
            call(&engine, Function::SubmitLoanApplication, suspended).unwrap_err().kind(),
            "ValidationError"
        );
        assert_eq!(engine.ledger().height().unwrap(), 2);
    }

    #[test]
    fn query_by_status_is_exact() {
        let engine = engine();
        let customer_id = create_customer(&engine);
        let loans: Vec<String> = (0..3).map(|_| submit_mortgage(&engine, &customer_id)).collect();
        set_loan_status(&engine, &loans[1], "UNDERWRITING").unwrap();

        let submitted = ask(&engine, Function::QueryLoansByStatus, "SUBMITTED").unwrap();
        let mut found = ids(&submitted, "loanID");
        found.sort();
        let mut expected = vec![loans[0].clone(), loans[2].clone()];
        expected.sort();
        assert_eq!(found, expected);

        let underwriting = ask(&engine, Function::QueryLoansByStatus, "UNDERWRITING").unwrap();
        assert_eq!(ids(&underwriting, "loanID"), vec![loans[1].clone()]);
        let approved = ask(&engine, Function::QueryLoansByStatus, "APPROVED").unwrap();
        assert!(approved.as_array().unwrap().is_empty());

        let err = ask(&engine, Function::QueryLoansByStatus, "NOPE").unwrap_err();
        assert_eq!(err.kind(), "InputError");

        let active = ask(&engine, Function::QueryCustomersByStatus, "ACTIVE").unwrap();
        assert_eq!(ids(&active, "customerID"), vec![customer_id]);
    }

    #[test]
    fn stale_status_entries_are_skipped() {
        let engine = engine();
        let customer_id = create_customer(&engine);
        let loan_id = submit_mortgage(&engine, &customer_id);

        // Rewrite the primary behind the index's back.
        let key = EntityType::Loan.primary_key(&loan_id);
        let mut unit = engine.ledger().begin("ops").unwrap();
        let mut loan: Value = unit.get_json(&key).unwrap().unwrap();
        loan["status"] = json!("UNDERWRITING");
        unit.put_json(&key, &loan).unwrap();
        engine.ledger().commit(unit).unwrap();

        let submitted = ask(&engine, Function::QueryLoansByStatus, "SUBMITTED").unwrap();
        assert!(submitted.as_array().unwrap().is_empty());
    }

    #[test]
    fn owner_queries_skip_dangling_entries() {
        let engine = engine();
        let alice = create_customer(&engine);
        let bob = create_customer(&engine);
        let alice_loans = [submit_mortgage(&engine, &alice), submit_mortgage(&engine, &alice)];
        let bob_loan = submit_mortgage(&engine, &bob);

        let found = ask(&engine, Function::QueryLoansByCustomer, &alice).unwrap();
        let mut found = ids(&found, "loanID");
        found.sort();
        let mut expected = alice_loans.to_vec();
        expected.sort();
        assert_eq!(found, expected);
        assert_eq!(
            ids(&ask(&engine, Function::QueryLoansByCustomer, &bob).unwrap(), "loanID"),
            vec![bob_loan]
        );

        let mut unit = engine.ledger().begin("ops").unwrap();
        unit.delete(&EntityType::Loan.primary_key(&alice_loans[0])).unwrap();
        engine.ledger().commit(unit).unwrap();

        let remaining = ask(&engine, Function::QueryLoansByCustomer, &alice).unwrap();
        assert_eq!(ids(&remaining, "loanID"), vec![alice_loans[1].clone()]);
        let submitted = ask(&engine, Function::QueryLoansByStatus, "SUBMITTED").unwrap();
        assert_eq!(submitted.as_array().unwrap().len(), 2);

        let err = ask(&engine, Function::QueryLoansByCustomer, "CUST_1").unwrap_err();
        assert_eq!(err.kind(), "InputError");
    }

    #[test]
    fn customer_profile_updates() {
        let engine = engine();
        let customer_id = create_customer(&engine);

        let updated = call(
            &engine,
            Function::UpdateCustomer,
            json!({"customerID": customer_id, "email": "ada@analytical.engine", "phone": "555-0100", "lastName": "Lovelace"}),
        )
        .unwrap();
        assert_eq!(updated["email"], "ada@analytical.engine");

        let history = engine.history(&customer_id).unwrap();
        let fields: Vec<&str> = history[1..].iter().map(|e| e.field_name.as_str()).collect();
        assert_eq!(fields, ["email", "phone"]);
        assert_eq!(history[1].previous_value, "ada@example.com");
        assert_eq!(history[2].previous_value, "");

        let err = call(
            &engine,
            Function::UpdateCustomer,
            json!({"customerID": customer_id, "lastName": "Lovelace"}),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "ValidationError");

        let err = call(
            &engine,
            Function::UpdateCustomer,
            json!({"customerID": customer_id, "email": "not-an-email"}),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
    }

    #[test]
    fn customer_status_lifecycle() {
        let engine = engine();
        let customer_id = create_customer(&engine);

        for status in ["SUSPENDED", "INACTIVE", "ACTIVE"] {
            call(
                &engine,
                Function::UpdateCustomerStatus,
                json!({"customerID": customer_id, "status": status}),
            )
            .unwrap();
        }
        let err = call(
            &engine,
            Function::UpdateCustomerStatus,
            json!({"customerID": customer_id, "status": "ACTIVE"}),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "TransitionError");

        let history = engine.history(&customer_id).unwrap();
        assert_eq!(history.len(), 4);
        assert!(history[1..].iter().all(|e| e.change_type == ChangeType::StatusUpdate));
        let active = ask(&engine, Function::QueryCustomersByStatus, "ACTIVE").unwrap();
        assert_eq!(active.as_array().unwrap().len(), 1);
        let suspended = ask(&engine, Function::QueryCustomersByStatus, "SUSPENDED").unwrap();
        assert!(suspended.as_array().unwrap().is_empty());
    }

    #[test]
    fn customer_onboarding_rules() {
        let engine = engine();
        let minor = json!({
            "firstName": "Young", "lastName": "Person", "email": "young@example.com",
            "dateOfBirth": "2020-01-01", "address": "1 Main St"
        });
        assert_eq!(
            call(&engine, Function::CreateCustomer, minor).unwrap_err().kind(),
            "ValidationError"
        );
        let bad_date = json!({
            "firstName": "A", "lastName": "B", "email": "a@example.com",
            "dateOfBirth": "01/02/1980", "address": "1 Main St"
        });
        assert_eq!(
            call(&engine, Function::CreateCustomer, bad_date).unwrap_err().kind(),
            "InputError"
        );
        let missing = json!({"firstName": "A", "lastName": "B"});
        assert_eq!(
            call(&engine, Function::CreateCustomer, missing).unwrap_err().kind(),
            "InputError"
        );
        assert_eq!(engine.ledger().height().unwrap(), 0);
    }

    #[test]
    fn kyc_result_updates_case_and_customer_together() {
        let engine = engine();
        let customer_id = create_customer(&engine);
        let case_id = open_case(&engine, &customer_id, "KYC");
        let mut stream = engine.subscribe(EventFilter {
            names: Some(vec![EventName::KycVerified]),
            ..Default::default()
        });

        let case = call(
            &engine,
            Function::RecordKycResult,
            json!({"caseID": case_id, "verified": true, "findings": "documents match"}),
        )
        .unwrap();
        assert_eq!(case["status"], "CLEARED");
        assert_eq!(case["findings"], "documents match");

        let customer = ask(&engine, Function::GetCustomer, &customer_id).unwrap();
        assert_eq!(customer["kycStatus"], "VERIFIED");

        let case_history = engine.history(&case_id).unwrap();
        let customer_history = engine.history(&customer_id).unwrap();
        let kyc_entry = customer_history.last().unwrap();
        assert_eq!(kyc_entry.field_name, "kycStatus");
        assert_eq!(kyc_entry.previous_value, "PENDING");
        assert_eq!(kyc_entry.new_value, "VERIFIED");
        assert_eq!(
            kyc_entry.transaction_id,
            case_history.last().unwrap().transaction_id
        );

        let event = stream.try_recv().unwrap();
        assert_eq!(event.event.metadata["kycStatus"], "VERIFIED");

        // Closed out; a second result no longer applies.
        let err = call(&engine, Function::RecordKycResult, json!({"caseID": case_id, "verified": false}))
            .unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
    }

    #[test]
    fn kyc_failure_flags_case() {
        let engine = engine();
        let customer_id = create_customer(&engine);
        let case_id = open_case(&engine, &customer_id, "KYC");
        let case = call(&engine, Function::RecordKycResult, json!({"caseID": case_id, "verified": false}))
            .unwrap();
        assert_eq!(case["status"], "FLAGGED");
        let customer = ask(&engine, Function::GetCustomer, &customer_id).unwrap();
        assert_eq!(customer["kycStatus"], "FAILED");
    }

    #[test]
    fn results_only_apply_to_matching_case_type() {
        let engine = engine();
        let customer_id = create_customer(&engine);
        let aml_case = open_case(&engine, &customer_id, "AML");
        let err = call(&engine, Function::RecordKycResult, json!({"caseID": aml_case, "verified": true}))
            .unwrap_err();
        assert_eq!(err.kind(), "ValidationError");

        let kyc_case = open_case(&engine, &customer_id, "KYC");
        let err = call(&engine, Function::RecordAmlCheck, json!({"caseID": kyc_case, "riskScore": 10}))
            .unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
    }

    #[test]
    fn aml_threshold_decides_outcome() {
        let engine = engine();
        let customer_id = create_customer(&engine);
        let risky = open_case(&engine, &customer_id, "AML");
        let benign = open_case(&engine, &customer_id, "AML");
        let mut stream = engine.subscribe(EventFilter {
            entity_types: Some(vec![EntityType::ComplianceCase]),
            ..Default::default()
        });

        let err = call(&engine, Function::RecordAmlCheck, json!({"caseID": risky, "riskScore": 150}))
            .unwrap_err();
        assert_eq!(err.kind(), "ValidationError");

        let flagged = call(&engine, Function::RecordAmlCheck, json!({"caseID": risky, "riskScore": 70}))
            .unwrap();
        assert_eq!(flagged["status"], "FLAGGED");
        assert_eq!(flagged["riskScore"], 70.0);
        let cleared = call(&engine, Function::RecordAmlCheck, json!({"caseID": benign, "riskScore": 12.5}))
            .unwrap();
        assert_eq!(cleared["status"], "CLEARED");

        assert_eq!(stream.try_recv().unwrap().event.event_type, EventName::AmlFlagged);
        assert_eq!(stream.try_recv().unwrap().event.event_type, EventName::AmlCheckCompleted);

        let history = engine.history(&risky).unwrap();
        let last = history.last().unwrap();
        assert_eq!(last.field_name, "riskScore");
        assert_eq!(last.new_value, "70.00");

        let flagged_cases = ask(&engine, Function::QueryCasesByStatus, "FLAGGED").unwrap();
        assert_eq!(ids(&flagged_cases, "caseID"), vec![risky.clone()]);
        let by_customer = ask(&engine, Function::QueryCasesByCustomer, &customer_id).unwrap();
        assert_eq!(by_customer.as_array().unwrap().len(), 2);

        call(&engine, Function::UpdateCaseStatus, json!({"caseID": risky, "status": "ESCALATED"}))
            .unwrap();
        call(&engine, Function::UpdateCaseStatus, json!({"caseID": risky, "status": "CLOSED"}))
            .unwrap();
        let err = call(&engine, Function::UpdateCaseStatus, json!({"caseID": risky, "status": "OPEN"}))
            .unwrap_err();
        assert_eq!(err.kind(), "TransitionError");
    }

    #[test]
    fn lookups_validate_ids() {
        let engine = engine();
        assert_eq!(ask(&engine, Function::GetLoan, "LOAN_1").unwrap_err().kind(), "InputError");
        assert_eq!(
            ask(&engine, Function::GetLoan, &rel_types::IdGenerator::generate("CUST"))
                .unwrap_err()
                .kind(),
            "InputError"
        );
        let missing = rel_types::IdGenerator::generate("LOAN");
        assert_eq!(ask(&engine, Function::GetLoan, &missing).unwrap_err().kind(), "NotFoundError");
        assert_eq!(
            ask(&engine, Function::GetHistory, &missing).unwrap_err().kind(),
            "NotFoundError"
        );
        assert_eq!(ask(&engine, Function::GetHistory, "nothing").unwrap_err().kind(), "InputError");
        assert_eq!(
            engine.invoke(ACTOR, Function::GetLoan, &[]).unwrap_err().kind(),
            "InputError"
        );
    }

    #[test]
    fn history_query_returns_creation_order() {
        let engine = engine();
        let customer_id = create_customer(&engine);
        let loan_id = submit_mortgage(&engine, &customer_id);
        set_loan_status(&engine, &loan_id, "UNDERWRITING").unwrap();

        let value = ask(&engine, Function::GetHistory, &loan_id).unwrap();
        let entries = value.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["changeType"], "CREATE");
        assert_eq!(entries[1]["changeType"], "UPDATE");
        assert_eq!(entries[0]["entityID"], loan_id);
    }

    #[test]
    fn json_surface() {
        let engine = engine();
        let response = engine.invoke_json(ACTOR, "LaunchRocket", &[]);
        let value: Value = serde_json::from_str(&response).unwrap();
        assert_eq!(value["error"]["kind"], "InputError");

        let response = engine.invoke_json(ACTOR, "QueryLoansByStatus", &["SUBMITTED".into()]);
        assert_eq!(response, "[]");

        assert_eq!("RecordKYCResult".parse::<Function>().unwrap(), Function::RecordKycResult);
        for function in Function::ALL {
            assert_eq!(function.as_str().parse::<Function>().unwrap(), function);
        }
    }

    #[test]
    fn blank_actor_rejected_before_any_write() {
        let engine = engine();
        let err = engine
            .invoke(
                "  ",
                Function::CreateCustomer,
                &[json!({
                    "firstName": "A", "lastName": "B", "email": "a@example.com",
                    "dateOfBirth": "1980-01-01", "address": "x"
                })
                .to_string()],
            )
            .unwrap_err();
        assert_eq!(err.kind(), "InputError");
        assert_eq!(engine.ledger().height().unwrap(), 0);
    }

    #[test]
    fn refused_event_aborts_the_mutation() {
        let mut config = EngineConfig::default();
        config.events.max_payload_bytes = 64;
        let engine = Engine::in_memory(config).unwrap();

        let err = engine
            .invoke(
                ACTOR,
                Function::CreateCustomer,
                &[json!({
                    "firstName": "Ada", "lastName": "Lovelace", "email": "ada@example.com",
                    "dateOfBirth": "1980-04-01", "address": "London"
                })
                .to_string()],
            )
            .unwrap_err();
        assert_eq!(err.kind(), "EventEmissionError");
        assert_eq!(engine.ledger().height().unwrap(), 0);
        let active = ask(&engine, Function::QueryCustomersByStatus, "ACTIVE").unwrap();
        assert!(active.as_array().unwrap().is_empty());
    }

    #[test]
    fn log_lists_commits_with_events() {
        let engine = engine();
        let customer_id = create_customer(&engine);
        submit_mortgage(&engine, &customer_id);

        let commits = engine.log(1, 10).unwrap();
        assert_eq!(commits.len(), 2);
        let events = engine.events_of(&commits[1]).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.event_type, EventName::LoanSubmitted);
        assert_eq!(engine.log(1, 1).unwrap().len(), 1);
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let (customer_id, loan_id) = {
            let engine = Engine::open(dir.path(), EngineConfig::default()).unwrap();
            let customer_id = create_customer(&engine);
            let loan_id = submit_mortgage(&engine, &customer_id);
            (customer_id, loan_id)
        };

        let engine = Engine::open(dir.path(), EngineConfig::default()).unwrap();
        let customer = ask(&engine, Function::GetCustomer, &customer_id).unwrap();
        assert_eq!(customer["status"], "ACTIVE");
        set_loan_status(&engine, &loan_id, "UNDERWRITING").unwrap();

        let history = engine.history(&loan_id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].new_value, "UNDERWRITING");
        assert!(engine.verify().unwrap().is_valid());
    }

    #[test]
    fn invalid_config_rejected() {
        let mut config = EngineConfig::default();
        config.aml_risk_threshold = 120.0;
        assert_eq!(Engine::in_memory(config).unwrap_err().kind(), "ConfigError");
    }
}
