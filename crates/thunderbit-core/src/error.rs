//! Error types for the Thunderbit Protocol

use crate::types::{BitId, Capability, CategoryId, EdgeId, Relation, Role};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown category: {0}")]
    UnknownCategory(String),

    #[error("invalid wiring: {from} cannot connect to {to}")]
    InvalidWiring { from: CategoryId, to: CategoryId },

    #[error("invalid relation: {relation} is not available to {role} ({from} -> {to})")]
    InvalidRelation {
        from: CategoryId,
        to: CategoryId,
        relation: Relation,
        role: Role,
    },

    #[error("maxim conflict: {0}")]
    MaximConflict(String),

    #[error("policy violation: {policy} - {reason}")]
    PolicyViolation { policy: String, reason: String },

    #[error("action blocked: {0}")]
    ActionBlocked(String),

    #[error("capability forbidden: {capability} for {category}")]
    CapabilityForbidden {
        category: CategoryId,
        capability: Capability,
    },

    #[error("cycle detected: linking {from} -> {to} closes a loop")]
    CycleDetected { from: BitId, to: BitId },

    #[error("incompatible io: no output of {from} feeds an input of {to}")]
    IncompatibleIo { from: CategoryId, to: CategoryId },

    #[error("already registered: {0}")]
    AlreadyRegistered(BitId),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0} is a protected field")]
    Forbidden(String),

    #[error("invalid attribute: {name} - {message}")]
    InvalidAttribute { name: String, message: String },

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn policy_violation(policy: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PolicyViolation {
            policy: policy.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_attribute(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidAttribute {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn bit_not_found(id: BitId) -> Self {
        Self::NotFound(format!("bit {}", id))
    }

    pub fn edge_not_found(id: EdgeId) -> Self {
        Self::NotFound(format!("edge {}", id))
    }

    /// True for the validation kinds a wiring check can produce.
    pub fn is_wiring_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownCategory(_)
                | Self::InvalidWiring { .. }
                | Self::InvalidRelation { .. }
                | Self::MaximConflict(_)
                | Self::CycleDetected { .. }
        )
    }
}
