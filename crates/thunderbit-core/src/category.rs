//! Category taxonomy entries.
//!
//! Every Thunderbit belongs to one of eight categories. A category fixes the
//! bit's role, which capabilities it may exercise, which ports it exposes and
//! which other categories it may be wired to. The compiled-in table below is
//! the fallback; [`crate::taxonomy::Taxonomy`] layers overrides on top.

use crate::error::{Error, Result};
use crate::types::{Capability, CategoryId, CompositionMode, IoType, Role, Shape};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A named input or output port.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortSpec {
    pub name: String,
    pub io_type: IoType,
    pub shape: Shape,
    #[serde(default)]
    pub required: bool,
}

impl PortSpec {
    pub fn new(name: impl Into<String>, io_type: IoType, shape: Shape) -> Self {
        Self {
            name: name.into(),
            io_type,
            shape,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Rendering hint. Opaque to the protocol, passed through to projections.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeometryHint {
    #[serde(rename = "type")]
    pub kind: String,
    pub shape: String,
    pub base_color: String,
}

impl GeometryHint {
    fn new(kind: &str, shape: &str, base_color: &str) -> Self {
        Self {
            kind: kind.into(),
            shape: shape.into(),
            base_color: base_color.into(),
        }
    }
}

/// Immutable taxonomy entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    /// Human-readable name
    pub name: String,
    pub role: Role,
    /// Ordered path from the ontology root, e.g. `["thunderbit", "perception", "sensory"]`
    pub ontology_path: Vec<String>,
    pub inputs: Vec<PortSpec>,
    pub outputs: Vec<PortSpec>,
    pub capabilities: BTreeSet<Capability>,
    pub forbidden: BTreeSet<Capability>,
    pub valid_targets: BTreeSet<CategoryId>,
    pub valid_sources: BTreeSet<CategoryId>,
    pub composition: CompositionMode,
    pub required_maxims: BTreeSet<String>,
    pub forbidden_maxims: BTreeSet<String>,
    pub geometry: GeometryHint,
}

impl Category {
    /// Declared and not forbidden.
    pub fn capability_allowed(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability) && !self.forbidden.contains(&capability)
    }

    pub fn can_target(&self, to: CategoryId) -> bool {
        self.valid_targets.contains(&to)
    }

    pub fn is_feedback(&self) -> bool {
        self.composition == CompositionMode::Feedback
    }

    /// Check the entry's own invariants.
    pub fn validate(&self) -> Result<()> {
        if let Some(cap) = self.capabilities.intersection(&self.forbidden).next() {
            return Err(Error::ConfigError(format!(
                "category {} both allows and forbids {}",
                self.id, cap
            )));
        }
        if !self.capability_allowed(self.role.capability()) {
            return Err(Error::ConfigError(format!(
                "category {} cannot exercise its role capability {}",
                self.id,
                self.role.capability()
            )));
        }
        let mut names = BTreeSet::new();
        for port in self.inputs.iter().chain(self.outputs.iter()) {
            if !names.insert(port.name.as_str()) {
                return Err(Error::ConfigError(format!(
                    "category {} declares port {} twice",
                    self.id, port.name
                )));
            }
        }
        Ok(())
    }
}

fn caps(list: &[Capability]) -> BTreeSet<Capability> {
    list.iter().copied().collect()
}

fn cats(list: &[CategoryId]) -> BTreeSet<CategoryId> {
    list.iter().copied().collect()
}

fn words(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn path(segments: &[&str]) -> Vec<String> {
    segments.iter().map(|s| s.to_string()).collect()
}

/// The compiled-in taxonomy, in [`CategoryId::all`] order.
pub fn builtin_categories() -> Vec<Category> {
    use Capability::*;
    use CategoryId::*;

    vec![
        Category {
            id: Sensory,
            name: "Sensory".into(),
            role: Role::Observer,
            ontology_path: path(&["thunderbit", "perception", "sensory"]),
            inputs: vec![PortSpec::new("raw", IoType::Signal, Shape::Stream)],
            outputs: vec![PortSpec::new("observation", IoType::Signal, Shape::Map).required()],
            capabilities: caps(&[Observe, Parse, Emit]),
            forbidden: caps(&[Act, Control, Orchestrate]),
            valid_targets: cats(&[Perceptual, Cognitive, Mnemonic]),
            valid_sources: cats(&[]),
            composition: CompositionMode::Serial,
            required_maxims: words(&["fidelity"]),
            forbidden_maxims: words(&[]),
            geometry: GeometryHint::new("node", "sphere", "#4fc3f7"),
        },
        Category {
            id: Cognitive,
            name: "Cognitive".into(),
            role: Role::Transformer,
            ontology_path: path(&["thunderbit", "cognition", "cognitive"]),
            inputs: vec![PortSpec::new("stimulus", IoType::Any, Shape::Any).required()],
            outputs: vec![PortSpec::new("intent", IoType::Intent, Shape::Map).required()],
            capabilities: caps(&[Transform, Infer, Parse, Retrieve, Emit]),
            forbidden: caps(&[Act]),
            valid_targets: cats(&[Cognitive, Mnemonic, Motor, Social, Ethical, Executive]),
            valid_sources: cats(&[
                Sensory, Perceptual, Cognitive, Mnemonic, Social, Ethical, Executive,
            ]),
            composition: CompositionMode::Feedback,
            required_maxims: words(&["coherence"]),
            forbidden_maxims: words(&["deception"]),
            geometry: GeometryHint::new("node", "icosahedron", "#ab47bc"),
        },
        Category {
            id: Mnemonic,
            name: "Mnemonic".into(),
            role: Role::Storage,
            ontology_path: path(&["thunderbit", "cognition", "mnemonic"]),
            inputs: vec![PortSpec::new("record", IoType::Any, Shape::Any).required()],
            outputs: vec![PortSpec::new("memory", IoType::Record, Shape::Map)],
            capabilities: caps(&[Store, Retrieve, Emit]),
            forbidden: caps(&[Act, Control]),
            valid_targets: cats(&[Perceptual, Cognitive, Executive, Mnemonic]),
            valid_sources: cats(&[
                Sensory, Perceptual, Cognitive, Mnemonic, Motor, Social, Executive,
            ]),
            composition: CompositionMode::Feedback,
            required_maxims: words(&["provenance"]),
            forbidden_maxims: words(&["fabrication"]),
            geometry: GeometryHint::new("node", "cube", "#66bb6a"),
        },
        Category {
            id: Motor,
            name: "Motor".into(),
            role: Role::Actuator,
            ontology_path: path(&["thunderbit", "action", "motor"]),
            inputs: vec![
                PortSpec::new("intent", IoType::Intent, Shape::Map),
                PortSpec::new("command", IoType::Command, Shape::Any),
                PortSpec::new("constraint", IoType::Verdict, Shape::Scalar),
                PortSpec::new("directive", IoType::Control, Shape::Map),
            ],
            outputs: vec![PortSpec::new("action", IoType::Command, Shape::Map).required()],
            capabilities: caps(&[Act, Emit]),
            forbidden: caps(&[Critique, Judge, Store]),
            valid_targets: cats(&[Mnemonic, Social]),
            valid_sources: cats(&[Cognitive, Ethical, Executive]),
            composition: CompositionMode::Serial,
            required_maxims: words(&["reversibility"]),
            forbidden_maxims: words(&["coercion", "deception"]),
            geometry: GeometryHint::new("node", "cone", "#ef5350"),
        },
        Category {
            id: Social,
            name: "Social".into(),
            role: Role::Router,
            ontology_path: path(&["thunderbit", "action", "social"]),
            inputs: vec![PortSpec::new("message", IoType::Any, Shape::Any).required()],
            outputs: vec![PortSpec::new("routed", IoType::Text, Shape::Stream)],
            capabilities: caps(&[Route, Broadcast, Emit]),
            forbidden: caps(&[Act, Store]),
            valid_targets: cats(&[Cognitive, Mnemonic, Social]),
            valid_sources: cats(&[Cognitive, Motor, Social, Executive]),
            composition: CompositionMode::Broadcast,
            required_maxims: words(&["consent"]),
            forbidden_maxims: words(&["manipulation"]),
            geometry: GeometryHint::new("node", "torus", "#ffa726"),
        },
        Category {
            id: Ethical,
            name: "Ethical".into(),
            role: Role::Critic,
            ontology_path: path(&["thunderbit", "governance", "ethical"]),
            inputs: vec![PortSpec::new("subject", IoType::Any, Shape::Any).required()],
            outputs: vec![PortSpec::new("verdict", IoType::Verdict, Shape::Scalar).required()],
            capabilities: caps(&[Critique, Judge, Emit]),
            forbidden: caps(&[Act, Control, Orchestrate]),
            valid_targets: cats(&[Motor, Cognitive, Executive]),
            valid_sources: cats(&[Perceptual, Cognitive]),
            composition: CompositionMode::Parallel,
            required_maxims: words(&["non_maleficence", "transparency"]),
            forbidden_maxims: words(&["expedience"]),
            geometry: GeometryHint::new("node", "octahedron", "#fdd835"),
        },
        Category {
            id: Perceptual,
            name: "Perceptual".into(),
            role: Role::Analyzer,
            ontology_path: path(&["thunderbit", "perception", "perceptual"]),
            inputs: vec![
                PortSpec::new("observation", IoType::Signal, Shape::Any).required(),
                PortSpec::new("context", IoType::Record, Shape::Map),
            ],
            outputs: vec![PortSpec::new("features", IoType::Features, Shape::Vector).required()],
            capabilities: caps(&[Analyze, Extract, Parse, Emit]),
            forbidden: caps(&[Act]),
            valid_targets: cats(&[Cognitive, Mnemonic, Ethical]),
            valid_sources: cats(&[Sensory, Mnemonic]),
            composition: CompositionMode::Parallel,
            required_maxims: words(&["fidelity"]),
            forbidden_maxims: words(&[]),
            geometry: GeometryHint::new("node", "dodecahedron", "#26c6da"),
        },
        Category {
            id: Executive,
            name: "Executive".into(),
            role: Role::Controller,
            ontology_path: path(&["thunderbit", "governance", "executive"]),
            inputs: vec![PortSpec::new("directive", IoType::Any, Shape::Any).required()],
            outputs: vec![PortSpec::new("control", IoType::Control, Shape::Map).required()],
            capabilities: caps(&[Control, Orchestrate, Infer, Emit]),
            forbidden: caps(&[Judge]),
            valid_targets: cats(&[Executive, Motor, Cognitive, Social, Mnemonic]),
            valid_sources: cats(&[Cognitive, Mnemonic, Ethical, Executive]),
            composition: CompositionMode::Feedback,
            required_maxims: words(&["accountability", "expedience"]),
            forbidden_maxims: words(&[]),
            geometry: GeometryHint::new("node", "prism", "#8d6e63"),
        },
    ]
}
