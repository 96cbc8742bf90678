//! Role-specific transition logic.
//!
//! Every role has exactly one handler and the dispatch match is exhaustive,
//! so adding a role without a handler does not compile.

use crate::context::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use thunderbit_core::ethics;
use thunderbit_core::{
    BitId, Capability, Category, Error, EthicsVerdict, InputEvent, Relation, Role, Thunderbit,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    ParsedEvent,
    TransformedEvent,
    RoutedEvent,
    ActionEvent,
    VerdictEvent,
    FeaturesEvent,
    StoredAck,
    ControlEvent,
}

impl OutputKind {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Observer => OutputKind::ParsedEvent,
            Role::Transformer => OutputKind::TransformedEvent,
            Role::Router => OutputKind::RoutedEvent,
            Role::Actuator => OutputKind::ActionEvent,
            Role::Critic => OutputKind::VerdictEvent,
            Role::Analyzer => OutputKind::FeaturesEvent,
            Role::Storage => OutputKind::StoredAck,
            Role::Controller => OutputKind::ControlEvent,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputKind::ParsedEvent => "parsed_event",
            OutputKind::TransformedEvent => "transformed_event",
            OutputKind::RoutedEvent => "routed_event",
            OutputKind::ActionEvent => "action_event",
            OutputKind::VerdictEvent => "verdict_event",
            OutputKind::FeaturesEvent => "features_event",
            OutputKind::StoredAck => "stored_ack",
            OutputKind::ControlEvent => "control_event",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a handler produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputEvent {
    pub kind: OutputKind,
    pub source: BitId,
    pub payload: Value,
    pub at: DateTime<Utc>,
}

impl OutputEvent {
    fn new(kind: OutputKind, source: BitId, payload: Value) -> Self {
        Self {
            kind,
            source,
            payload,
            at: Utc::now(),
        }
    }
}

/// Why a step stopped without advancing the bit.
#[derive(Clone, Debug, PartialEq)]
pub enum HaltReason {
    ActionBlocked(String),
    CapabilityDenied { capability: Capability, reason: String },
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::ActionBlocked(reason) => write!(f, "action blocked: {}", reason),
            HaltReason::CapabilityDenied { capability, reason } => {
                write!(f, "capability {} denied: {}", capability, reason)
            }
        }
    }
}

/// Result of a single `step`.
#[derive(Clone, Debug)]
pub enum StepOutcome {
    Advanced {
        bit: Thunderbit,
        outputs: Vec<OutputEvent>,
        ctx: Context,
    },
    Halted(HaltReason),
}

impl StepOutcome {
    pub fn is_halted(&self) -> bool {
        matches!(self, StepOutcome::Halted(_))
    }

    pub fn outputs(&self) -> &[OutputEvent] {
        match self {
            StepOutcome::Advanced { outputs, .. } => outputs,
            StepOutcome::Halted(_) => &[],
        }
    }
}

/// A handler's result before the engine records it.
pub(crate) struct Handled {
    pub output: OutputEvent,
    pub verdict: Option<EthicsVerdict>,
}

/// Capability gate run before any handler.
pub(crate) fn check_role_capability(
    category: &Category,
    ctx: &Context,
) -> std::result::Result<Capability, HaltReason> {
    let capability = category.role.capability();
    ethics::check_capability(category, capability, ctx.policies())
        .map(|_| capability)
        .map_err(|e| HaltReason::CapabilityDenied {
            capability,
            reason: e.to_string(),
        })
}

pub(crate) fn dispatch(
    bit: &Thunderbit,
    category: &Category,
    event: &InputEvent,
    ctx: &Context,
) -> std::result::Result<Handled, HaltReason> {
    match bit.role() {
        Role::Observer => Ok(plain(observe(bit, event))),
        Role::Transformer => Ok(plain(transform(bit, event))),
        Role::Router => Ok(plain(route(bit, event, ctx))),
        Role::Actuator => act(bit, category, event, ctx).map(plain),
        Role::Critic => Ok(critique(bit, category, event, ctx)),
        Role::Analyzer => Ok(plain(analyze(bit, event))),
        Role::Storage => Ok(plain(store(bit, event))),
        Role::Controller => Ok(plain(control(bit, event, ctx))),
    }
}

fn plain(output: OutputEvent) -> Handled {
    Handled {
        output,
        verdict: None,
    }
}

fn observe(bit: &Thunderbit, event: &InputEvent) -> OutputEvent {
    let data = match &event.payload {
        Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| json!({ "text": s.trim() })),
        other => other.clone(),
    };
    OutputEvent::new(
        OutputKind::ParsedEvent,
        bit.id(),
        json!({
            "event": event.kind,
            "data": data,
            "observed_at": event.at,
        }),
    )
}

fn transform(bit: &Thunderbit, event: &InputEvent) -> OutputEvent {
    OutputEvent::new(
        OutputKind::TransformedEvent,
        bit.id(),
        json!({
            "intent": event.kind,
            "input": event.payload,
            "confidence": bit.salience,
        }),
    )
}

fn route(bit: &Thunderbit, event: &InputEvent, ctx: &Context) -> OutputEvent {
    let targets: Vec<String> = ctx
        .outgoing(bit.id())
        .filter(|e| ctx.contains(e.to_id()))
        .map(|e| e.to_id().to_string())
        .collect();
    OutputEvent::new(
        OutputKind::RoutedEvent,
        bit.id(),
        json!({
            "message": event.payload,
            "targets": targets,
        }),
    )
}

fn act(
    bit: &Thunderbit,
    category: &Category,
    event: &InputEvent,
    ctx: &Context,
) -> std::result::Result<OutputEvent, HaltReason> {
    if let Err(e) = ethics::check_action(bit, category, event, ctx.policies()) {
        let reason = match e {
            Error::ActionBlocked(reason) => reason,
            other => other.to_string(),
        };
        tracing::info!(bit = %bit.id(), action = %event.kind, %reason, "actuator halted");
        return Err(HaltReason::ActionBlocked(reason));
    }
    Ok(OutputEvent::new(
        OutputKind::ActionEvent,
        bit.id(),
        json!({
            "action": event.kind,
            "params": event.payload,
        }),
    ))
}

fn critique(bit: &Thunderbit, category: &Category, event: &InputEvent, ctx: &Context) -> Handled {
    let verdict = ethics::evaluate(bit, category, event, ctx.policies(), ctx.maxims());
    let output = OutputEvent::new(
        OutputKind::VerdictEvent,
        bit.id(),
        json!({
            "subject": event.kind,
            "decision": verdict.decision,
            "reason": verdict.reason,
        }),
    );
    Handled {
        output,
        verdict: Some(verdict),
    }
}

fn analyze(bit: &Thunderbit, event: &InputEvent) -> OutputEvent {
    OutputEvent::new(
        OutputKind::FeaturesEvent,
        bit.id(),
        json!({
            "source": event.kind,
            "features": features(&event.payload),
        }),
    )
}

/// Summary statistics for numeric arrays, key lists for objects, lengths for text.
fn features(payload: &Value) -> Value {
    match payload {
        Value::Array(items) => {
            let nums: Vec<f64> = items.iter().filter_map(Value::as_f64).collect();
            if nums.is_empty() {
                return json!({ "count": items.len() });
            }
            let sum: f64 = nums.iter().sum();
            let min = nums.iter().copied().fold(f64::INFINITY, f64::min);
            let max = nums.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            json!({
                "count": items.len(),
                "mean": sum / nums.len() as f64,
                "min": min,
                "max": max,
            })
        }
        Value::Object(map) => json!({ "keys": map.keys().collect::<Vec<_>>() }),
        Value::String(s) => json!({
            "chars": s.chars().count(),
            "words": s.split_whitespace().count(),
        }),
        Value::Number(n) => json!({ "value": n }),
        Value::Bool(b) => json!({ "value": b }),
        Value::Null => Value::Object(Map::new()),
    }
}

fn store(bit: &Thunderbit, event: &InputEvent) -> OutputEvent {
    let size = serde_json::to_vec(&event.payload).map(|v| v.len()).unwrap_or(0);
    OutputEvent::new(
        OutputKind::StoredAck,
        bit.id(),
        json!({
            "key": event.kind,
            "stored": true,
            "bytes": size,
        }),
    )
}

fn control(bit: &Thunderbit, event: &InputEvent, ctx: &Context) -> OutputEvent {
    let targets: Vec<String> = ctx
        .outgoing(bit.id())
        .filter(|e| matches!(e.relation(), Relation::Commands | Relation::Orchestrates))
        .map(|e| e.to_id().to_string())
        .collect();
    OutputEvent::new(
        OutputKind::ControlEvent,
        bit.id(),
        json!({
            "directive": event.kind,
            "params": event.payload,
            "targets": targets,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_role_maps_to_a_distinct_output() {
        let kinds: std::collections::HashSet<_> =
            Role::all().iter().map(|r| OutputKind::for_role(*r)).collect();
        assert_eq!(kinds.len(), Role::all().len());
    }

    #[test]
    fn numeric_features_summarize() {
        let f = features(&json!([1.0, 2.0, 3.0]));
        assert_eq!(f["count"], 3);
        assert_eq!(f["mean"], 2.0);
        assert_eq!(f["min"], 1.0);
        assert_eq!(f["max"], 3.0);
    }

    #[test]
    fn text_features_count_words() {
        let f = features(&json!("the quick fox"));
        assert_eq!(f["words"], 3);
        assert_eq!(f["chars"], 13);
    }

    #[test]
    fn output_kind_labels() {
        assert_eq!(OutputKind::ActionEvent.to_string(), "action_event");
        let v = serde_json::to_value(OutputKind::StoredAck).unwrap();
        assert_eq!(v, "stored_ack");
    }
}
