//! Protocol configuration
//!
//! Wiring rules, projection limits, default context scope and category
//! overrides in one place. Loaded from TOML, falls back to defaults if the
//! file is missing or unreadable.

use crate::context::Context;
use crate::projection::Projector;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thunderbit_core::{CategoryOverride, Error, Policy, Result, Taxonomy, WiringRules};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThunderbitConfig {
    pub wiring: WiringConfig,
    pub projection: ProjectionConfig,
    /// Scope, maxims and policies for new contexts.
    pub context: ContextConfig,
    /// Per-category overrides layered over the compiled taxonomy.
    pub categories: Vec<CategoryOverride>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WiringConfig {
    /// Let feedback-composition categories close loops.
    pub allow_feedback_cycles: bool,
    /// Reject links that close a cycle at all.
    pub check_cycles: bool,
    /// Require a compatible port pair on every link.
    pub check_io: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Labels longer than this are cut and end in an ellipsis.
    pub label_max_chars: usize,
    /// Active bits below this energy are shown as fading.
    pub fading_energy: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub owner: Option<String>,
    pub zone: Option<String>,
    pub maxims: Vec<String>,
    pub policies: Vec<Policy>,
}

// ============================================================
// Defaults
// ============================================================

impl Default for WiringConfig {
    fn default() -> Self {
        Self { allow_feedback_cycles: true, check_cycles: true, check_io: true }
    }
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self { label_max_chars: 30, fading_energy: 0.15 }
    }
}

// ============================================================
// Loading
// ============================================================

impl ThunderbitConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match Self::read(path) {
            Ok(config) => {
                tracing::info!("Loaded config from {}", path.display());
                config
            }
            Err(Error::IoError(_)) => {
                tracing::info!("No config at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    /// Strict variant of [`ThunderbitConfig::load`].
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::ConfigError(e.to_string()))
    }

    /// Render the current config as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::ConfigError(e.to_string()))
    }

    pub fn wiring_rules(&self) -> WiringRules {
        WiringRules {
            check_cycles: self.wiring.check_cycles,
            allow_feedback_cycles: self.wiring.allow_feedback_cycles,
        }
    }

    /// Compiled taxonomy with the configured overrides applied.
    pub fn taxonomy(&self) -> Result<Taxonomy> {
        Taxonomy::builtin().with_overrides(self.categories.clone())
    }

    pub fn projector(&self, taxonomy: Taxonomy) -> Projector {
        Projector::new(
            taxonomy,
            self.projection.label_max_chars,
            self.projection.fading_energy,
        )
    }

    /// Fresh context carrying the configured scope, maxims and policies.
    pub fn new_context(&self) -> Context {
        let mut ctx = Context::new().with_policies(self.context.policies.iter().cloned());
        if let Some(owner) = &self.context.owner {
            ctx = ctx.with_owner(owner.clone());
        }
        if let Some(zone) = &self.context.zone {
            ctx = ctx.with_zone(zone.clone());
        }
        for maxim in &self.context.maxims {
            ctx = ctx.with_maxim(maxim.clone());
        }
        ctx
    }
}
