//! Thunderbit Protocol - context threading, verbs, projection and broadcast

pub mod broadcast;
pub mod config;
pub mod context;
pub mod engine;
pub mod projection;
pub mod step;

pub use broadcast::{BroadcastEvent, Broadcaster, PublishError};
pub use config::{ContextConfig, ProjectionConfig, ThunderbitConfig, WiringConfig};
pub use context::{Context, DomainEvent, EventKind, LogEntry, Scope};
pub use engine::{Continuation, LinkOptions, Protocol, SpawnAttrs};
pub use projection::{BitDto, EdgeDto, GraphView, LinkDto, Projector};
pub use step::{HaltReason, OutputEvent, OutputKind, StepOutcome};
