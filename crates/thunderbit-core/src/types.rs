//! Closed vocabularies and identifiers shared across the protocol

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Thunderbit identity - unique, immutable after spawn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BitId(pub Uuid);

impl BitId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BitId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Edge identity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub Uuid);

impl EdgeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EdgeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Declares a closed, string-labelled enum with `all()`, `name()`,
/// `Display` and case-insensitive `FromStr`.
macro_rules! closed_set {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $label)] $variant, )+
        }

        impl $name {
            pub fn all() -> &'static [$name] {
                &[ $( $name::$variant, )+ ]
            }

            pub fn name(&self) -> &'static str {
                match self {
                    $( $name::$variant => $label, )+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                let wanted = s.trim().to_ascii_lowercase();
                $name::all()
                    .iter()
                    .copied()
                    .find(|v| v.name() == wanted)
                    .ok_or_else(|| format!("unknown {}: {}", stringify!($name), s))
            }
        }
    };
}

closed_set! {
    /// Category identifier. The taxonomy is closed over these eight entries.
    pub enum CategoryId {
        Sensory => "sensory",
        Cognitive => "cognitive",
        Mnemonic => "mnemonic",
        Motor => "motor",
        Social => "social",
        Ethical => "ethical",
        Perceptual => "perceptual",
        Executive => "executive",
    }
}

impl CategoryId {
    /// Parse a category name, mapping failure onto the protocol error.
    pub fn parse(s: &str) -> Result<Self> {
        s.parse().map_err(|_| Error::UnknownCategory(s.to_string()))
    }

    /// Semantic kind a freshly spawned bit of this category carries.
    pub fn default_kind(&self) -> Kind {
        match self {
            CategoryId::Sensory => Kind::WorldUpdate,
            CategoryId::Cognitive => Kind::Intent,
            CategoryId::Mnemonic => Kind::Memory,
            CategoryId::Motor => Kind::Command,
            CategoryId::Social => Kind::Message,
            CategoryId::Ethical => Kind::Verdict,
            CategoryId::Perceptual => Kind::Percept,
            CategoryId::Executive => Kind::Directive,
        }
    }
}

closed_set! {
    /// Processing role. Every category has exactly one.
    pub enum Role {
        Observer => "observer",
        Transformer => "transformer",
        Storage => "storage",
        Actuator => "actuator",
        Router => "router",
        Critic => "critic",
        Analyzer => "analyzer",
        Controller => "controller",
    }
}

impl Role {
    /// The capability a role exercises when it handles an event.
    pub fn capability(&self) -> Capability {
        match self {
            Role::Observer => Capability::Observe,
            Role::Transformer => Capability::Transform,
            Role::Storage => Capability::Store,
            Role::Actuator => Capability::Act,
            Role::Router => Capability::Route,
            Role::Critic => Capability::Critique,
            Role::Analyzer => Capability::Analyze,
            Role::Controller => Capability::Control,
        }
    }
}

closed_set! {
    pub enum Capability {
        Observe => "observe",
        Parse => "parse",
        Transform => "transform",
        Infer => "infer",
        Store => "store",
        Retrieve => "retrieve",
        Act => "act",
        Emit => "emit",
        Route => "route",
        Broadcast => "broadcast",
        Critique => "critique",
        Judge => "judge",
        Analyze => "analyze",
        Extract => "extract",
        Control => "control",
        Orchestrate => "orchestrate",
    }
}

closed_set! {
    /// Edge relation type.
    pub enum Relation {
        Feeds => "feeds",
        Inhibits => "inhibits",
        Modulates => "modulates",
        Contains => "contains",
        References => "references",
        StoresIn => "stores_in",
        Retrieves => "retrieves",
        Constrains => "constrains",
        Commands => "commands",
        Orchestrates => "orchestrates",
        Consolidates => "consolidates",
        Contextualizes => "contextualizes",
        Expresses => "expresses",
        Filters => "filters",
    }
}

impl Relation {
    /// Strength assigned when a link does not specify one.
    pub fn default_strength(&self) -> f64 {
        match self {
            Relation::Feeds => 1.0,
            Relation::Inhibits => 0.5,
            Relation::Modulates => 0.7,
            Relation::Contains => 1.0,
            Relation::References => 0.5,
            Relation::StoresIn => 0.9,
            Relation::Retrieves => 0.8,
            Relation::Constrains => 0.8,
            Relation::Commands => 1.0,
            Relation::Orchestrates => 0.9,
            Relation::Consolidates => 0.7,
            Relation::Contextualizes => 0.6,
            Relation::Expresses => 0.8,
            Relation::Filters => 0.6,
        }
    }

    /// Roles allowed on the source side of this relation.
    pub fn valid_roles(&self) -> &'static [Role] {
        use Role::*;
        match self {
            Relation::Feeds => &[Observer, Transformer, Storage, Actuator, Router, Analyzer, Controller],
            Relation::Inhibits => &[Critic, Controller, Transformer],
            Relation::Modulates => &[Controller, Critic, Transformer, Analyzer],
            Relation::Contains => &[Storage, Controller],
            Relation::References => &[
                Observer, Transformer, Storage, Actuator, Router, Critic, Analyzer, Controller,
            ],
            Relation::StoresIn => &[Observer, Transformer, Analyzer, Actuator, Router, Controller],
            Relation::Retrieves => &[Transformer, Analyzer, Controller],
            Relation::Constrains => &[Critic, Controller],
            Relation::Commands => &[Controller, Transformer],
            Relation::Orchestrates => &[Controller],
            Relation::Consolidates => &[Storage, Transformer],
            Relation::Contextualizes => &[Storage, Analyzer, Observer, Transformer],
            Relation::Expresses => &[Transformer, Actuator, Router],
            Relation::Filters => &[Analyzer, Critic, Router, Observer],
        }
    }

    pub fn allows_role(&self, role: Role) -> bool {
        self.valid_roles().contains(&role)
    }
}

closed_set! {
    /// How a category composes with its neighbours.
    pub enum CompositionMode {
        Serial => "serial",
        Parallel => "parallel",
        /// Loops through this category are intentional.
        Feedback => "feedback",
        Broadcast => "broadcast",
    }
}

closed_set! {
    /// Semantic subtype of a bit. Changes only through transformation.
    pub enum Kind {
        WorldUpdate => "world_update",
        Intent => "intent",
        Memory => "memory",
        Command => "command",
        Message => "message",
        Verdict => "verdict",
        Percept => "percept",
        Directive => "directive",
        Question => "question",
        Statement => "statement",
        Goal => "goal",
    }
}

closed_set! {
    /// Port data type.
    pub enum IoType {
        Any => "any",
        Signal => "signal",
        Text => "text",
        Intent => "intent",
        Command => "command",
        Record => "record",
        Verdict => "verdict",
        Features => "features",
        Control => "control",
    }
}

closed_set! {
    /// Port data shape.
    pub enum Shape {
        Any => "any",
        Scalar => "scalar",
        Vector => "vector",
        Map => "map",
        Stream => "stream",
    }
}

closed_set! {
    /// Lifecycle status surfaced to rendering consumers.
    pub enum BitStatus {
        Spawning => "spawning",
        Active => "active",
        Fading => "fading",
        Archived => "archived",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parse_is_case_insensitive() {
        assert_eq!(CategoryId::parse("Sensory").unwrap(), CategoryId::Sensory);
        assert_eq!(CategoryId::parse(" motor ").unwrap(), CategoryId::Motor);
        assert!(matches!(
            CategoryId::parse("astral"),
            Err(Error::UnknownCategory(name)) if name == "astral"
        ));
    }

    #[test]
    fn relation_labels_are_snake_case() {
        assert_eq!(Relation::StoresIn.name(), "stores_in");
        assert_eq!(
            serde_json::to_string(&Relation::StoresIn).unwrap(),
            r#""stores_in""#
        );
        assert_eq!("STORES_IN".parse::<Relation>().unwrap(), Relation::StoresIn);
    }

    #[test]
    fn every_role_exercises_a_distinct_capability() {
        let mut caps: Vec<_> = Role::all().iter().map(|r| r.capability()).collect();
        caps.sort();
        caps.dedup();
        assert_eq!(caps.len(), Role::all().len());
    }

    #[test]
    fn every_relation_has_source_roles_and_unit_strength() {
        for rel in Relation::all() {
            assert!(!rel.valid_roles().is_empty(), "{} has no roles", rel);
            let s = rel.default_strength();
            assert!((0.0..=1.0).contains(&s), "{} strength {}", rel, s);
        }
    }

    #[test]
    fn bit_id_serializes_as_plain_uuid() {
        let id = BitId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.0));
    }
}
