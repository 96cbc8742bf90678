//! Ethics gate: policies, maxims and action checks.
//!
//! Policies are supplied by the caller and treated as opaque input. Every
//! check is deny-first: the first matching restriction wins and is reported.

use crate::bit::{InputEvent, Thunderbit};
use crate::category::Category;
use crate::error::{Error, Result};
use crate::taxonomy::maxim_conflict;
use crate::types::{Capability, CategoryId, Relation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Matches every action kind in `blocked_actions`.
pub const ALL_ACTIONS: &str = "*";

/// A named set of restrictions active for a Context.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub name: String,
    pub restricted_categories: BTreeSet<CategoryId>,
    pub restricted_relations: BTreeSet<Relation>,
    /// Action kinds Actuators may not perform; `"*"` blocks all.
    pub blocked_actions: BTreeSet<String>,
    pub forbidden_capabilities: BTreeSet<Capability>,
}

impl Policy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn restrict_category(mut self, id: CategoryId) -> Self {
        self.restricted_categories.insert(id);
        self
    }

    pub fn restrict_relation(mut self, relation: Relation) -> Self {
        self.restricted_relations.insert(relation);
        self
    }

    pub fn block_action(mut self, kind: impl Into<String>) -> Self {
        self.blocked_actions.insert(kind.into());
        self
    }

    pub fn forbid_capability(mut self, capability: Capability) -> Self {
        self.forbidden_capabilities.insert(capability);
        self
    }

    pub fn blocks_action(&self, kind: &str) -> bool {
        self.blocked_actions.contains(ALL_ACTIONS) || self.blocked_actions.contains(kind)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Approve => f.write_str("approve"),
            Decision::Reject => f.write_str("reject"),
        }
    }
}

/// Outcome of a critic's evaluation, recorded on the bit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EthicsVerdict {
    pub decision: Decision,
    #[serde(default)]
    pub reason: Option<String>,
    pub evaluated_at: DateTime<Utc>,
}

impl EthicsVerdict {
    pub fn approve() -> Self {
        Self {
            decision: Decision::Approve,
            reason: None,
            evaluated_at: Utc::now(),
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Reject,
            reason: Some(reason.into()),
            evaluated_at: Utc::now(),
        }
    }

    pub fn is_approved(&self) -> bool {
        self.decision == Decision::Approve
    }
}

/// Spawning is denied if any policy restricts the category.
pub fn check_spawn(category: &Category, policies: &[Policy]) -> Result<()> {
    match policies
        .iter()
        .find(|p| p.restricted_categories.contains(&category.id))
    {
        Some(p) => Err(Error::policy_violation(
            &p.name,
            format!("spawning {} is restricted", category.id),
        )),
        None => Ok(()),
    }
}

/// Maxim compatibility in the link direction, then relation restrictions.
pub fn check_link(
    from: &Category,
    to: &Category,
    relation: Relation,
    policies: &[Policy],
) -> Result<()> {
    maxim_conflict(from, to)?;
    match policies
        .iter()
        .find(|p| p.restricted_relations.contains(&relation))
    {
        Some(p) => Err(Error::policy_violation(
            &p.name,
            format!("relation {} is restricted ({} -> {})", relation, from.id, to.id),
        )),
        None => Ok(()),
    }
}

/// Bit-level variant of [`check_link`], confirming the categories match the bits.
pub fn check_bit_link(
    from_bit: &Thunderbit,
    to_bit: &Thunderbit,
    from: &Category,
    to: &Category,
    relation: Relation,
    policies: &[Policy],
) -> Result<()> {
    for (bit, cat) in [(from_bit, from), (to_bit, to)] {
        if bit.category() != cat.id {
            return Err(Error::invalid_attribute(
                "category",
                format!("bit {} is {}, checked as {}", bit.id(), bit.category(), cat.id),
            ));
        }
    }
    check_link(from, to, relation, policies)
}

/// The category must allow the capability and no policy may forbid it.
pub fn check_capability(category: &Category, capability: Capability, policies: &[Policy]) -> Result<()> {
    if !category.capability_allowed(capability) {
        return Err(Error::CapabilityForbidden {
            category: category.id,
            capability,
        });
    }
    match policies
        .iter()
        .find(|p| p.forbidden_capabilities.contains(&capability))
    {
        Some(p) => Err(Error::policy_violation(
            &p.name,
            format!("capability {} is forbidden", capability),
        )),
        None => Ok(()),
    }
}

/// Gate run before an actuator performs `event`.
pub fn check_action(
    bit: &Thunderbit,
    category: &Category,
    event: &InputEvent,
    policies: &[Policy],
) -> Result<()> {
    if let Some(p) = policies.iter().find(|p| p.blocks_action(&event.kind)) {
        return Err(Error::ActionBlocked(format!(
            "policy {} blocks action {}",
            p.name, event.kind
        )));
    }
    if let Some(m) = event
        .maxims
        .iter()
        .find(|m| category.forbidden_maxims.contains(*m))
    {
        return Err(Error::ActionBlocked(format!(
            "{} forbids acting under maxim {}",
            bit.category(),
            m
        )));
    }
    Ok(())
}

/// Judge `event` from the critic bit's standpoint.
pub fn evaluate(
    bit: &Thunderbit,
    category: &Category,
    event: &InputEvent,
    policies: &[Policy],
    active_maxims: &BTreeSet<String>,
) -> EthicsVerdict {
    if let Some(m) = event
        .maxims
        .iter()
        .find(|m| category.forbidden_maxims.contains(*m))
    {
        return EthicsVerdict::reject(format!("invokes forbidden maxim {}", m));
    }
    if let Some(m) = event
        .declared_violations()
        .into_iter()
        .find(|m| active_maxims.contains(*m) || bit.maxims.contains(*m))
    {
        return EthicsVerdict::reject(format!("violates maxim {}", m));
    }
    if let Some(p) = policies.iter().find(|p| p.blocks_action(&event.kind)) {
        return EthicsVerdict::reject(format!("policy {} blocks {}", p.name, event.kind));
    }
    EthicsVerdict::approve()
}
