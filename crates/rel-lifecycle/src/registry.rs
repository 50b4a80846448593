use std::collections::BTreeMap;

use rel_types::{CaseStatus, CustomerStatus, EntityType, LoanStatus, StatusValue};
use tracing::debug;

use crate::error::{Result, TransitionError};
use crate::graph::TransitionGraph;

/// Set of transition graphs keyed by entity type name.
///
/// A registry is built once and then only read; there is no global instance.
#[derive(Clone, Debug, Default)]
pub struct GraphRegistry {
    graphs: BTreeMap<String, TransitionGraph>,
}

impl GraphRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the loan, customer, and compliance case graphs.
    pub fn standard() -> Result<Self> {
        let mut registry = Self::new();
        registry.register(loan_graph()?)?;
        registry.register(customer_graph()?)?;
        registry.register(case_graph()?)?;
        Ok(registry)
    }

    /// Add a graph for a new entity type.
    pub fn register(&mut self, graph: TransitionGraph) -> Result<()> {
        let name = graph.entity_type().to_string();
        if self.graphs.contains_key(&name) {
            return Err(TransitionError::DuplicateGraph(name));
        }
        debug!(entity_type = %name, "transition graph registered");
        self.graphs.insert(name, graph);
        Ok(())
    }

    /// The graph for an entity type.
    pub fn graph(&self, entity_type: &str) -> Result<&TransitionGraph> {
        self.graphs
            .get(entity_type)
            .ok_or_else(|| TransitionError::UnknownEntityType(entity_type.to_string()))
    }

    /// Accept iff the graph for `entity_type` has an edge `current -> next`.
    pub fn validate(&self, entity_type: &str, current: &str, next: &str) -> Result<()> {
        self.graph(entity_type)?.validate(current, next)
    }

    /// Typed form of [`validate`](Self::validate).
    pub fn validate_status<S: StatusValue>(&self, current: S, next: S) -> Result<()> {
        self.validate(S::ENTITY.as_str(), current.as_str(), next.as_str())
    }

    /// Registered entity type names, in lexicographic order.
    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.graphs.keys().map(String::as_str)
    }

    /// Returns `true` if a graph is registered for the built-in entity type.
    pub fn covers(&self, entity_type: EntityType) -> bool {
        self.graphs.contains_key(entity_type.as_str())
    }
}

fn loan_graph() -> Result<TransitionGraph> {
    use LoanStatus::*;
    TransitionGraph::from_status_edges::<LoanStatus>(&[
        (Submitted, &[Underwriting, Rejected]),
        (Underwriting, &[CreditApproval, Rejected]),
        (CreditApproval, &[Approved, Rejected]),
        (Approved, &[Disbursed]),
    ])
}

fn customer_graph() -> Result<TransitionGraph> {
    use CustomerStatus::*;
    TransitionGraph::from_status_edges::<CustomerStatus>(&[
        (Active, &[Inactive, Suspended]),
        (Inactive, &[Active, Suspended]),
        (Suspended, &[Active, Inactive]),
    ])
}

fn case_graph() -> Result<TransitionGraph> {
    use CaseStatus::*;
    TransitionGraph::from_status_edges::<CaseStatus>(&[
        (Open, &[UnderReview]),
        (UnderReview, &[Cleared, Flagged]),
        (Flagged, &[Escalated, Cleared]),
        (Cleared, &[Closed]),
        (Escalated, &[Closed]),
    ])
}
