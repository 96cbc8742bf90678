//! Wiring validation: category adjacency, relation roles and cycles

use crate::edge::Edge;
use crate::error::{Error, Result};
use crate::taxonomy::Taxonomy;
use crate::types::{BitId, CategoryId, Relation};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Knobs controlling which graphs the validator accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WiringRules {
    /// Reject links that would close a cycle.
    pub check_cycles: bool,
    /// Let feedback-composition categories close loops anyway.
    pub allow_feedback_cycles: bool,
}

impl Default for WiringRules {
    fn default() -> Self {
        Self {
            check_cycles: true,
            allow_feedback_cycles: true,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct WiringValidator {
    taxonomy: Taxonomy,
    rules: WiringRules,
}

impl WiringValidator {
    pub fn new(taxonomy: Taxonomy, rules: WiringRules) -> Self {
        Self { taxonomy, rules }
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn rules(&self) -> WiringRules {
        self.rules
    }

    /// Adjacency plus maxim compatibility in the feeds direction.
    pub fn validate_categories(&self, from: CategoryId, to: CategoryId) -> Result<()> {
        let src = self.taxonomy.get(from)?;
        self.taxonomy.get(to)?;
        if !src.can_target(to) {
            return Err(Error::InvalidWiring { from, to });
        }
        self.taxonomy.check_maxim_compatibility(from, to)
    }

    pub fn wiring_valid(&self, from: CategoryId, to: CategoryId) -> bool {
        self.validate_categories(from, to).is_ok()
    }

    /// Category checks plus the relation's source-role restriction.
    pub fn validate_relation(&self, from: CategoryId, to: CategoryId, relation: Relation) -> Result<()> {
        self.validate_categories(from, to)?;
        let role = self.taxonomy.get(from)?.role;
        if !relation.allows_role(role) {
            return Err(Error::InvalidRelation {
                from,
                to,
                relation,
                role,
            });
        }
        Ok(())
    }

    /// Cycle rejection for a new `from_id -> to_id` link, honouring the
    /// feedback exemption of the source category.
    pub fn check_cycle(
        &self,
        from_category: CategoryId,
        from_id: BitId,
        to_id: BitId,
        edges: &[Edge],
    ) -> Result<()> {
        if !self.rules.check_cycles {
            return Ok(());
        }
        if self.rules.allow_feedback_cycles && self.taxonomy.get(from_category)?.is_feedback() {
            return Ok(());
        }
        if would_create_cycle(from_id, to_id, edges) {
            tracing::debug!(%from_id, %to_id, "link rejected: closes a cycle");
            return Err(Error::CycleDetected {
                from: from_id,
                to: to_id,
            });
        }
        Ok(())
    }

    /// Validate every edge independently and collect every failure.
    pub fn validate_graph(&self, edges: &[Edge]) -> std::result::Result<(), Vec<(Edge, Error)>> {
        let failures: Vec<(Edge, Error)> = edges
            .iter()
            .filter_map(|edge| {
                self.validate_relation(edge.from_category(), edge.to_category(), edge.relation())
                    .err()
                    .map(|e| (edge.clone(), e))
            })
            .collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures)
        }
    }
}

/// True iff `to_id` already reaches `from_id`, so adding `from_id -> to_id`
/// would close a cycle. A self-edge always does.
pub fn would_create_cycle(from_id: BitId, to_id: BitId, edges: &[Edge]) -> bool {
    if from_id == to_id {
        return true;
    }
    let mut adjacency: HashMap<BitId, Vec<BitId>> = HashMap::new();
    for edge in edges {
        adjacency.entry(edge.from_id()).or_default().push(edge.to_id());
    }

    let mut stack = vec![to_id];
    let mut seen = HashSet::new();
    while let Some(node) = stack.pop() {
        if node == from_id {
            return true;
        }
        if !seen.insert(node) {
            continue;
        }
        if let Some(next) = adjacency.get(&node) {
            stack.extend(next.iter().copied().filter(|n| !seen.contains(n)));
        }
    }
    false
}
