//! Ledger core for the Regulated Entity Ledger (REL).
//!
//! This crate ties the store and the event fabric into one commit protocol:
//! - [`UnitOfWork`] -- the atomic scope a handler mutates through
//! - [`HistoryRecorder`] / [`HistoryEntry`] -- immutable, per-field audit entries
//! - [`Ledger`] -- begins units of work and commits (state, history, events) together
//! - [`HybridLogicalClock`] -- monotonic anchors for creation-ordered history IDs
//! - [`AuditValidator`] -- walks every history stream and reports violations

pub mod audit;
pub mod error;
pub mod history;
pub mod hlc;
pub mod ledger;
pub mod unit;

pub use audit::{AuditReport, AuditValidator, Violation, ViolationKind};
pub use error::{LedgerError, LedgerResult};
pub use history::{
    history_anchor, history_key, read_history, FieldChange, HistoryEntry, HistoryRecorder, HISTORY_ID_PREFIX,
    HISTORY_OBJECT_TYPE,
};
pub use hlc::HybridLogicalClock;
pub use ledger::{CommitReceipt, Ledger};
pub use unit::UnitOfWork;
