//! Directed, typed relationships between bits

use crate::bit::{check_unit, Thunderbit};
use crate::error::Result;
use crate::types::{BitId, CategoryId, EdgeId, Relation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An edge's topology is fixed at creation. Only strength and metadata can
/// be amended, and amending yields a new value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    id: EdgeId,
    from_id: BitId,
    to_id: BitId,
    from_category: CategoryId,
    to_category: CategoryId,
    relation: Relation,
    strength: f64,
    #[serde(default)]
    metadata: Map<String, Value>,
    created_at: DateTime<Utc>,
}

impl Edge {
    /// Edge between two bits with the relation's default strength.
    pub fn between(from: &Thunderbit, to: &Thunderbit, relation: Relation) -> Self {
        Self::from_parts(
            from.id(),
            from.category(),
            to.id(),
            to.category(),
            relation,
        )
    }

    /// Edge from raw endpoints, e.g. when checking a proposed graph.
    pub fn from_parts(
        from_id: BitId,
        from_category: CategoryId,
        to_id: BitId,
        to_category: CategoryId,
        relation: Relation,
    ) -> Self {
        Self {
            id: EdgeId::new(),
            from_id,
            to_id,
            from_category,
            to_category,
            relation,
            strength: relation.default_strength(),
            metadata: Map::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_strength(mut self, strength: f64) -> Result<Self> {
        check_unit("strength", strength)?;
        self.strength = strength;
        Ok(self)
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Copy with new strength and/or extra metadata keys merged in.
    pub fn amend(&self, strength: Option<f64>, metadata: Option<Map<String, Value>>) -> Result<Self> {
        let mut edge = self.clone();
        if let Some(s) = strength {
            check_unit("strength", s)?;
            edge.strength = s;
        }
        if let Some(extra) = metadata {
            edge.metadata.extend(extra);
        }
        Ok(edge)
    }

    pub fn id(&self) -> EdgeId {
        self.id
    }

    pub fn from_id(&self) -> BitId {
        self.from_id
    }

    pub fn to_id(&self) -> BitId {
        self.to_id
    }

    pub fn from_category(&self) -> CategoryId {
        self.from_category
    }

    pub fn to_category(&self) -> CategoryId {
        self.to_category
    }

    pub fn relation(&self) -> Relation {
        self.relation
    }

    pub fn strength(&self) -> f64 {
        self.strength
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn touches(&self, id: BitId) -> bool {
        self.from_id == id || self.to_id == id
    }
}
