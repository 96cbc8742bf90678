//! Thunderbit node instances and the events they consume

use crate::category::Category;
use crate::error::{Error, Result};
use crate::ethics::EthicsVerdict;
use crate::types::{BitId, BitStatus, Capability, CategoryId, Kind, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Fields no transformation may change.
pub const PROTECTED_FIELDS: &[&str] = &["id", "category", "role", "created_at"];

/// Named inputs and outputs a bit has produced so far.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IoState {
    #[serde(default)]
    pub inputs: BTreeMap<String, Value>,
    #[serde(default)]
    pub outputs: BTreeMap<String, Value>,
}

/// A typed node in the computational graph.
///
/// Identity, category, role and creation time are private and only readable;
/// everything else is plain data that verbs transform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Thunderbit {
    id: BitId,
    category: CategoryId,
    role: Role,
    created_at: DateTime<Utc>,
    pub kind: Kind,
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub energy: f64,
    pub salience: f64,
    #[serde(default)]
    pub owner: Option<String>,
    /// Granted at spawn from the category
    #[serde(default)]
    pub capabilities: BTreeSet<Capability>,
    /// Required maxims inherited from the category
    #[serde(default)]
    pub maxims: BTreeSet<String>,
    #[serde(default)]
    pub capabilities_used: BTreeSet<Capability>,
    #[serde(default)]
    pub ethics_verdict: Option<EthicsVerdict>,
    #[serde(default)]
    pub io_state: IoState,
    pub status: BitStatus,
    pub updated_at: DateTime<Utc>,
}

impl Thunderbit {
    /// Fresh bit for `category` with default attributes.
    pub fn new(category: &Category) -> Self {
        let now = Utc::now();
        Self {
            id: BitId::new(),
            category: category.id,
            role: category.role,
            created_at: now,
            kind: category.id.default_kind(),
            content: Value::Null,
            tags: BTreeSet::new(),
            energy: 1.0,
            salience: 0.5,
            owner: None,
            capabilities: category.capabilities.clone(),
            maxims: category.required_maxims.clone(),
            capabilities_used: BTreeSet::new(),
            ethics_verdict: None,
            io_state: IoState::default(),
            status: BitStatus::Spawning,
            updated_at: now,
        }
    }

    pub fn id(&self) -> BitId {
        self.id
    }

    pub fn category(&self) -> CategoryId {
        self.category
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Force the protected fields back to `original`'s values.
    pub fn with_identity_of(mut self, original: &Thunderbit) -> Self {
        self.id = original.id;
        self.category = original.category;
        self.role = original.role;
        self.created_at = original.created_at;
        self
    }

    pub fn same_identity(&self, other: &Thunderbit) -> bool {
        self.id == other.id
            && self.category == other.category
            && self.role == other.role
            && self.created_at == other.created_at
    }

    /// Range checks on the numeric attributes.
    pub fn validate(&self) -> Result<()> {
        check_unit("energy", self.energy)?;
        check_unit("salience", self.salience)?;
        Ok(())
    }

    /// Stamp `updated_at` and leave `spawning` once the bit has been touched.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
        if self.status == BitStatus::Spawning {
            self.status = BitStatus::Active;
        }
    }

    pub fn content_text(&self) -> Option<&str> {
        self.content.as_str()
    }
}

pub(crate) fn check_unit(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::invalid_attribute(
            name,
            format!("{} is outside [0, 1]", value),
        ))
    }
}

/// An event handed to a bit's role handler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    /// Event name, e.g. `"utterance"` or `"move_arm"`
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
    /// Maxims the event claims to act under
    #[serde(default)]
    pub maxims: BTreeSet<String>,
    pub at: DateTime<Utc>,
}

impl InputEvent {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
            maxims: BTreeSet::new(),
            at: Utc::now(),
        }
    }

    pub fn with_maxim(mut self, maxim: impl Into<String>) -> Self {
        self.maxims.insert(maxim.into());
        self
    }

    /// Maxims the payload says it violates (`"violates": [...]`).
    pub fn declared_violations(&self) -> Vec<&str> {
        self.payload
            .get("violates")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default()
    }
}
