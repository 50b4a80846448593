use std::collections::{BTreeMap, BTreeSet};

use rel_types::StatusValue;

use crate::error::{Result, TransitionError};

/// Immutable directed graph of legal status transitions for one entity type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionGraph {
    entity_type: String,
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl TransitionGraph {
    /// Start building a graph for the named entity type.
    pub fn builder(entity_type: impl Into<String>) -> TransitionGraphBuilder {
        TransitionGraphBuilder {
            entity_type: entity_type.into(),
            edges: BTreeMap::new(),
            dangling: Vec::new(),
        }
    }

    /// Build a graph over a typed status set.
    ///
    /// Every member of `S::all()` becomes a node; members without an entry in
    /// `edges` are terminal.
    pub fn from_status_edges<S: StatusValue>(edges: &[(S, &[S])]) -> Result<Self> {
        let mut builder = Self::builder(S::ENTITY.as_str());
        for status in S::all() {
            builder = builder.node(status.as_str());
        }
        for (from, targets) in edges {
            builder = builder.edges(from.as_str(), targets.iter().map(|s| s.as_str()));
        }
        builder.build()
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Returns `true` if `status` is a node of this graph.
    pub fn contains(&self, status: &str) -> bool {
        self.edges.contains_key(status)
    }

    /// Statuses reachable in one step from `status`, in lexicographic order.
    pub fn allowed_next(&self, status: &str) -> Result<impl Iterator<Item = &str>> {
        let targets = self
            .edges
            .get(status)
            .ok_or_else(|| self.unknown(status))?;
        Ok(targets.iter().map(String::as_str))
    }

    /// Returns `true` if `status` has no outgoing edges.
    pub fn is_terminal(&self, status: &str) -> Result<bool> {
        Ok(self.allowed_next(status)?.next().is_none())
    }

    /// Every node of the graph, in lexicographic order.
    pub fn statuses(&self) -> impl Iterator<Item = &str> {
        self.edges.keys().map(String::as_str)
    }

    /// Accept iff the edge `current -> next` exists.
    pub fn validate(&self, current: &str, next: &str) -> Result<()> {
        let targets = self
            .edges
            .get(current)
            .ok_or_else(|| self.unknown(current))?;
        if targets.contains(next) {
            Ok(())
        } else {
            Err(TransitionError::IllegalTransition {
                entity_type: self.entity_type.clone(),
                from: current.to_string(),
                to: next.to_string(),
            })
        }
    }

    fn unknown(&self, status: &str) -> TransitionError {
        TransitionError::UnknownStatus {
            entity_type: self.entity_type.clone(),
            status: status.to_string(),
        }
    }
}

/// Builder for [`TransitionGraph`].
#[derive(Debug)]
pub struct TransitionGraphBuilder {
    entity_type: String,
    edges: BTreeMap<String, BTreeSet<String>>,
    dangling: Vec<String>,
}

impl TransitionGraphBuilder {
    /// Declare a node (terminal unless edges are added from it).
    pub fn node(mut self, status: &str) -> Self {
        self.edges.entry(status.to_string()).or_default();
        self
    }

    /// Declare edges `from -> to` for every `to` in `targets`.
    ///
    /// `from` is declared implicitly; every target must be declared as a
    /// node or a source somewhere in the builder.
    pub fn edges<'a>(mut self, from: &str, targets: impl IntoIterator<Item = &'a str>) -> Self {
        let entry = self.edges.entry(from.to_string()).or_default();
        for to in targets {
            entry.insert(to.to_string());
            self.dangling.push(to.to_string());
        }
        self
    }

    pub fn build(self) -> Result<TransitionGraph> {
        let invalid = |reason: String| TransitionError::InvalidGraph {
            entity_type: self.entity_type.clone(),
            reason,
        };

        if self.entity_type.is_empty() {
            return Err(invalid("empty entity type".into()));
        }
        if self.edges.is_empty() {
            return Err(invalid("graph has no statuses".into()));
        }
        if let Some(target) = self.dangling.iter().find(|t| !self.edges.contains_key(*t)) {
            return Err(invalid(format!("edge target {target} is not a declared status")));
        }
        for (from, targets) in &self.edges {
            if targets.contains(from) {
                return Err(invalid(format!("self-loop on {from}")));
            }
        }

        Ok(TransitionGraph {
            entity_type: self.entity_type,
            edges: self.edges,
        })
    }
}
