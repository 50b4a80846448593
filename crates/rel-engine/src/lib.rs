//! Entity-lifecycle engine for the Regulated Entity Ledger (REL).
//!
//! The [`Engine`] accepts invocations (a [`Function`] plus positional string
//! arguments), runs the matching handler inside one unit of work, and commits
//! the new revision, its history entries, its index entries, and its change
//! event together.
//!
//! # Entities
//!
//! - [`Loan`] -- SUBMITTED → UNDERWRITING → CREDIT_APPROVAL → APPROVED → DISBURSED,
//!   with REJECTED reachable from the first three states
//! - [`Customer`] -- ACTIVE, INACTIVE, SUSPENDED, plus a KYC status field
//! - [`ComplianceCase`] -- KYC, AML, and sanctions reviews
//!
//! # Example
//!
//! ```rust
//! use rel_engine::{Engine, EngineConfig, Function};
//!
//! let engine = Engine::in_memory(EngineConfig::default()).unwrap();
//! let customers = engine
//!     .invoke("analyst", Function::QueryCustomersByStatus, &["ACTIVE".into()])
//!     .unwrap();
//! assert!(customers.as_array().unwrap().is_empty());
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod index;
pub mod model;
pub mod request;

pub use config::{EngineConfig, LoanLimits, LoanProducts, StorageConfig};
pub use engine::{Engine, Function};
pub use error::{EngineError, EngineResult};
pub use model::{AuditStamp, CaseType, ComplianceCase, Customer, Entity, Loan, LoanType};
