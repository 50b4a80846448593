//! Foundation types for the Regulated Entity Ledger (REL).
//!
//! This crate provides the identity, temporal, and classification types used
//! throughout the REL system. Every other REL crate depends on `rel-types`.
//!
//! # Key Types
//!
//! - [`EntityType`] -- The closed set of tracked record kinds (loan, customer, case)
//! - [`ChangeType`] -- Classification of a history entry
//! - [`LoanStatus`], [`CustomerStatus`], [`CaseStatus`] -- Per-type status sets
//! - [`TemporalAnchor`] -- Instant stamped on a unit of work
//! - [`IdGenerator`] -- Collision-resistant, type-prefixed identifiers

pub mod entity;
pub mod error;
pub mod id;
pub mod status;
pub mod temporal;

pub use entity::{ChangeType, EntityType};
pub use error::TypeError;
pub use id::IdGenerator;
pub use status::{CaseStatus, CustomerStatus, KycStatus, LoanStatus, StatusValue};
pub use temporal::TemporalAnchor;
