//! The immutable unit of work threaded through every verb.
//!
//! A [`Context`] owns the bits, edges, active policies and maxims of one
//! workflow plus two append-only logs. Storage is `Arc`-shared, so cloning is
//! cheap and a verb only copies the collections it actually changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use thunderbit_core::{BitId, Edge, EdgeId, Error, Policy, Result, Thunderbit};
use uuid::Uuid;

/// Who the work is done for and where.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub zone: Option<String>,
}

/// One line of the transformation log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub verb: String,
    #[serde(default)]
    pub bit_id: Option<BitId>,
    #[serde(default)]
    pub detail: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    BitSpawned,
    BitBound,
    BitsLinked,
    BitStepped,
    BitMutated,
    BitRetired,
    EdgeAmended,
    EdgeRemoved,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::BitSpawned => "bit_spawned",
            EventKind::BitBound => "bit_bound",
            EventKind::BitsLinked => "bits_linked",
            EventKind::BitStepped => "bit_stepped",
            EventKind::BitMutated => "bit_mutated",
            EventKind::BitRetired => "bit_retired",
            EventKind::EdgeAmended => "edge_amended",
            EventKind::EdgeRemoved => "edge_removed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A domain event appended by a successful verb.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub kind: EventKind,
    #[serde(default)]
    pub bit_id: Option<BitId>,
    #[serde(default)]
    pub edge_id: Option<EdgeId>,
    #[serde(default)]
    pub payload: Value,
    pub at: DateTime<Utc>,
}

impl DomainEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            bit_id: None,
            edge_id: None,
            payload: Value::Null,
            at: Utc::now(),
        }
    }

    pub fn for_bit(kind: EventKind, id: BitId) -> Self {
        Self {
            bit_id: Some(id),
            ..Self::new(kind)
        }
    }

    pub fn for_edge(kind: EventKind, id: EdgeId) -> Self {
        Self {
            edge_id: Some(id),
            ..Self::new(kind)
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Context {
    session_id: Uuid,
    created_at: DateTime<Utc>,
    #[serde(default)]
    scope: Scope,
    #[serde(default)]
    bits: Arc<HashMap<BitId, Thunderbit>>,
    #[serde(default)]
    edges: Arc<Vec<Edge>>,
    #[serde(default)]
    policies: Arc<Vec<Policy>>,
    #[serde(default)]
    maxims: Arc<BTreeSet<String>>,
    #[serde(default)]
    log: Arc<Vec<LogEntry>>,
    #[serde(default)]
    events: Arc<Vec<DomainEvent>>,
    #[serde(default)]
    metadata: Arc<Map<String, Value>>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            created_at: Utc::now(),
            scope: Scope::default(),
            bits: Arc::default(),
            edges: Arc::default(),
            policies: Arc::default(),
            maxims: Arc::default(),
            log: Arc::default(),
            events: Arc::default(),
            metadata: Arc::default(),
        }
    }

    // -- construction ------------------------------------------------------

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.scope.owner = Some(owner.into());
        self
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.scope.zone = Some(zone.into());
        self
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        Arc::make_mut(&mut self.policies).push(policy);
        self
    }

    pub fn with_policies(mut self, policies: impl IntoIterator<Item = Policy>) -> Self {
        Arc::make_mut(&mut self.policies).extend(policies);
        self
    }

    pub fn with_maxim(mut self, maxim: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.maxims).insert(maxim.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        Arc::make_mut(&mut self.metadata).insert(key.into(), value);
        self
    }

    // -- reads -------------------------------------------------------------

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn bits(&self) -> &HashMap<BitId, Thunderbit> {
        &self.bits
    }

    pub fn bit(&self, id: BitId) -> Option<&Thunderbit> {
        self.bits.get(&id)
    }

    /// Like [`Context::bit`] but `NotFound` when absent.
    pub fn require_bit(&self, id: BitId) -> Result<&Thunderbit> {
        self.bits.get(&id).ok_or_else(|| Error::bit_not_found(id))
    }

    pub fn contains(&self, id: BitId) -> bool {
        self.bits.contains_key(&id)
    }

    pub fn bit_count(&self) -> usize {
        self.bits.len()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id() == id)
    }

    /// Edges leaving `id`, in insertion order.
    pub fn outgoing(&self, id: BitId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.from_id() == id)
    }

    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    pub fn maxims(&self) -> &BTreeSet<String> {
        &self.maxims
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn events(&self) -> &[DomainEvent] {
        &self.events
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    // -- copy-on-write updates used by the engine ---------------------------

    pub(crate) fn put_bit(&mut self, bit: Thunderbit) {
        Arc::make_mut(&mut self.bits).insert(bit.id(), bit);
    }

    pub(crate) fn remove_bit(&mut self, id: BitId) -> Option<Thunderbit> {
        Arc::make_mut(&mut self.bits).remove(&id)
    }

    pub(crate) fn push_edge(&mut self, edge: Edge) {
        Arc::make_mut(&mut self.edges).push(edge);
    }

    pub(crate) fn replace_edge(&mut self, edge: Edge) {
        let edges = Arc::make_mut(&mut self.edges);
        if let Some(slot) = edges.iter_mut().find(|e| e.id() == edge.id()) {
            *slot = edge;
        }
    }

    pub(crate) fn remove_edge(&mut self, id: EdgeId) -> Option<Edge> {
        let edges = Arc::make_mut(&mut self.edges);
        let pos = edges.iter().position(|e| e.id() == id)?;
        Some(edges.remove(pos))
    }

    pub(crate) fn record(&mut self, verb: &str, bit_id: Option<BitId>, detail: impl Into<String>) {
        Arc::make_mut(&mut self.log).push(LogEntry {
            at: Utc::now(),
            verb: verb.to_string(),
            bit_id,
            detail: detail.into(),
        });
    }

    pub(crate) fn emit(&mut self, event: DomainEvent) {
        Arc::make_mut(&mut self.events).push(event);
    }

    // -- durable form ------------------------------------------------------

    /// Plain map suitable for a document store. Timestamps are RFC 3339.
    pub fn to_map(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(Error::invalid_attribute(
                "context",
                format!("serialized to {} instead of an object", other),
            )),
        }
    }

    /// Inverse of [`Context::to_map`]. Every bit must be valid and stored
    /// under its own id.
    pub fn from_map(map: Map<String, Value>) -> Result<Self> {
        let ctx: Self = serde_json::from_value(Value::Object(map))?;
        for (key, bit) in ctx.bits.iter() {
            if *key != bit.id() {
                return Err(Error::invalid_attribute(
                    "bits",
                    format!("entry {} holds bit {}", key, bit.id()),
                ));
            }
            bit.validate()?;
        }
        Ok(ctx)
    }
}
