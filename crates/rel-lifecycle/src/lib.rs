//! Status transition validation for the Regulated Entity Ledger.
//!
//! Each entity type owns an immutable [`TransitionGraph`] of legal
//! status-to-status edges. Graphs are collected in a [`GraphRegistry`]; a new
//! entity type is supported by registering one more graph, never by editing
//! an existing one.
//!
//! ```rust
//! use rel_lifecycle::GraphRegistry;
//! use rel_types::LoanStatus;
//!
//! let registry = GraphRegistry::standard().unwrap();
//! assert!(registry
//!     .validate_status(LoanStatus::Submitted, LoanStatus::Underwriting)
//!     .is_ok());
//! assert!(registry
//!     .validate_status(LoanStatus::Submitted, LoanStatus::Disbursed)
//!     .is_err());
//! ```

pub mod error;
pub mod graph;
pub mod registry;

pub use error::TransitionError;
pub use graph::{TransitionGraph, TransitionGraphBuilder};
pub use registry::GraphRegistry;
