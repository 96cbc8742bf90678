//! The protocol verbs.
//!
//! Every verb takes the current [`Context`] by reference and, on success,
//! returns a new one. Validation always runs before anything is registered or
//! appended, so a failed verb leaves the caller's context untouched.

use crate::broadcast::{BroadcastEvent, Broadcaster, PublishError};
use crate::config::ThunderbitConfig;
use crate::context::{Context, DomainEvent, EventKind};
use crate::projection::{GraphView, Projector};
use crate::step::{self, StepOutcome};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use thunderbit_core::ethics;
use thunderbit_core::io::check_categories;
use thunderbit_core::{
    BitId, CategoryId, Edge, EdgeId, Error, InputEvent, Kind, Relation, Result, Taxonomy,
    Thunderbit, WiringRules, WiringValidator, PROTECTED_FIELDS,
};

/// Optional overrides applied at spawn.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpawnAttrs {
    pub kind: Option<Kind>,
    pub content: Option<Value>,
    pub tags: BTreeSet<String>,
    pub energy: Option<f64>,
    pub salience: Option<f64>,
    /// Defaults to the context owner
    pub owner: Option<String>,
}

impl SpawnAttrs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: Kind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn content(mut self, content: impl Into<Value>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn energy(mut self, energy: f64) -> Self {
        self.energy = Some(energy);
        self
    }

    pub fn salience(mut self, salience: f64) -> Self {
        self.salience = Some(salience);
        self
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

/// Strength and metadata for [`Protocol::link_with`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinkOptions {
    pub strength: Option<f64>,
    pub metadata: Map<String, Value>,
}

/// A step in a [`Protocol::chain`]. Receives the bit and the context it lives
/// in, returns the next bit and the context to register it into.
pub type Continuation<'a> =
    Box<dyn FnOnce(Thunderbit, &Context) -> Result<(Thunderbit, Context)> + 'a>;

#[derive(Clone, Debug)]
pub struct Protocol {
    validator: WiringValidator,
    projector: Projector,
    check_io: bool,
}

impl Default for Protocol {
    fn default() -> Self {
        Self::new(Taxonomy::builtin(), WiringRules::default())
    }
}

impl Protocol {
    pub fn new(taxonomy: Taxonomy, rules: WiringRules) -> Self {
        Self {
            projector: Projector::new(taxonomy.clone(), 30, 0.15),
            validator: WiringValidator::new(taxonomy, rules),
            check_io: true,
        }
    }

    pub fn from_config(config: &ThunderbitConfig) -> Result<Self> {
        let taxonomy = config.taxonomy()?;
        Ok(Self {
            projector: config.projector(taxonomy.clone()),
            validator: WiringValidator::new(taxonomy, config.wiring_rules()),
            check_io: config.wiring.check_io,
        })
    }

    pub fn with_io_check(mut self, enabled: bool) -> Self {
        self.check_io = enabled;
        self
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        self.validator.taxonomy()
    }

    pub fn validator(&self) -> &WiringValidator {
        &self.validator
    }

    pub fn projector(&self) -> &Projector {
        &self.projector
    }

    // ------------------------------------------------------------------
    // spawn
    // ------------------------------------------------------------------

    pub fn spawn(
        &self,
        category: CategoryId,
        attrs: SpawnAttrs,
        ctx: &Context,
    ) -> Result<(Thunderbit, Context)> {
        let cat = self.taxonomy().get(category)?;
        ethics::check_spawn(&cat, ctx.policies())?;

        let mut bit = Thunderbit::new(&cat);
        if let Some(kind) = attrs.kind {
            bit.kind = kind;
        }
        if let Some(content) = attrs.content {
            bit.content = content;
        }
        bit.tags = attrs.tags;
        if let Some(energy) = attrs.energy {
            bit.energy = energy;
        }
        if let Some(salience) = attrs.salience {
            bit.salience = salience;
        }
        bit.owner = attrs.owner.or_else(|| ctx.scope().owner.clone());
        bit.validate()?;

        let mut next = ctx.clone();
        next.put_bit(bit.clone());
        next.record("spawn", Some(bit.id()), format!("{} as {}", category, bit.kind));
        next.emit(
            DomainEvent::for_bit(EventKind::BitSpawned, bit.id())
                .with_payload(json!({ "category": category, "kind": bit.kind })),
        );
        tracing::debug!(bit = %bit.id(), %category, "spawned");
        Ok((bit, next))
    }

    /// Spawn into a throwaway context and keep only the bit.
    pub fn spawn_detached(&self, category: CategoryId, attrs: SpawnAttrs) -> Result<Thunderbit> {
        self.spawn(category, attrs, &Context::new()).map(|(bit, _)| bit)
    }

    // ------------------------------------------------------------------
    // bind / chain
    // ------------------------------------------------------------------

    /// Run `f` on the bit and its context, then register the returned bit,
    /// identity restored, into the context `f` returned.
    pub fn bind<F>(&self, id: BitId, f: F, ctx: &Context) -> Result<(Thunderbit, Context)>
    where
        F: FnOnce(Thunderbit, &Context) -> Result<(Thunderbit, Context)>,
    {
        let original = ctx.require_bit(id)?.clone();
        let (bit, mut next) = f(original.clone(), ctx)?;
        let mut bit = bit.with_identity_of(&original);
        bit.validate()?;
        bit.touch();

        next.put_bit(bit.clone());
        next.record("bind", Some(id), "");
        next.emit(DomainEvent::for_bit(EventKind::BitBound, id));
        Ok((bit, next))
    }

    /// Fold `bind` over `steps`, stopping at the first failure.
    pub fn chain(
        &self,
        id: BitId,
        steps: Vec<Continuation<'_>>,
        ctx: &Context,
    ) -> Result<(Thunderbit, Context)> {
        let mut current = (ctx.require_bit(id)?.clone(), ctx.clone());
        for f in steps {
            current = self.bind(id, f, &current.1)?;
        }
        Ok(current)
    }

    // ------------------------------------------------------------------
    // link / unlink / amend
    // ------------------------------------------------------------------

    pub fn link(
        &self,
        from: BitId,
        to: BitId,
        relation: Relation,
        ctx: &Context,
    ) -> Result<(Edge, Context)> {
        self.link_with(from, to, relation, LinkOptions::default(), ctx)
    }

    pub fn link_with(
        &self,
        from: BitId,
        to: BitId,
        relation: Relation,
        options: LinkOptions,
        ctx: &Context,
    ) -> Result<(Edge, Context)> {
        let from_bit = ctx.require_bit(from)?;
        let to_bit = ctx.require_bit(to)?;

        if let Err(e) = self.check_link(from_bit, to_bit, relation, ctx) {
            tracing::debug!(%from, %to, %relation, error = %e, "link rejected");
            return Err(e);
        }

        let mut edge = Edge::between(from_bit, to_bit, relation);
        if let Some(strength) = options.strength {
            edge = edge.with_strength(strength)?;
        }
        if !options.metadata.is_empty() {
            edge = edge.with_metadata(options.metadata);
        }

        let mut next = ctx.clone();
        next.push_edge(edge.clone());
        next.record("link", Some(from), format!("{} -[{}]-> {}", from, relation, to));
        next.emit(
            DomainEvent::for_edge(EventKind::BitsLinked, edge.id()).with_payload(json!({
                "from_id": from,
                "to_id": to,
                "relation": relation,
            })),
        );
        Ok((edge, next))
    }

    fn check_link(
        &self,
        from_bit: &Thunderbit,
        to_bit: &Thunderbit,
        relation: Relation,
        ctx: &Context,
    ) -> Result<()> {
        let (from_cat, to_cat) = (from_bit.category(), to_bit.category());
        self.validator.validate_relation(from_cat, to_cat, relation)?;

        let from = self.taxonomy().get(from_cat)?;
        let to = self.taxonomy().get(to_cat)?;
        ethics::check_bit_link(from_bit, to_bit, &from, &to, relation, ctx.policies())?;

        if self.check_io {
            check_categories(self.taxonomy(), from_cat, to_cat)?;
        }
        self.validator
            .check_cycle(from_cat, from_bit.id(), to_bit.id(), ctx.edges())
    }

    pub fn unlink(&self, edge_id: EdgeId, ctx: &Context) -> Result<Context> {
        let mut next = ctx.clone();
        let edge = next
            .remove_edge(edge_id)
            .ok_or_else(|| Error::edge_not_found(edge_id))?;
        next.record("unlink", Some(edge.from_id()), edge_id.to_string());
        next.emit(DomainEvent::for_edge(EventKind::EdgeRemoved, edge_id));
        Ok(next)
    }

    /// New strength and/or merged metadata; topology never changes.
    pub fn amend_edge(
        &self,
        edge_id: EdgeId,
        strength: Option<f64>,
        metadata: Option<Map<String, Value>>,
        ctx: &Context,
    ) -> Result<(Edge, Context)> {
        let amended = ctx
            .edge(edge_id)
            .ok_or_else(|| Error::edge_not_found(edge_id))?
            .amend(strength, metadata)?;

        let mut next = ctx.clone();
        next.replace_edge(amended.clone());
        next.record("amend_edge", Some(amended.from_id()), edge_id.to_string());
        next.emit(
            DomainEvent::for_edge(EventKind::EdgeAmended, edge_id)
                .with_payload(json!({ "strength": amended.strength() })),
        );
        Ok((amended, next))
    }

    // ------------------------------------------------------------------
    // step
    // ------------------------------------------------------------------

    /// Run the bit's role handler on `event`.
    ///
    /// Denied capabilities and blocked actions halt the step; they are not
    /// errors. Errors are reserved for a missing bit or category.
    pub fn step(&self, id: BitId, event: InputEvent, ctx: &Context) -> Result<StepOutcome> {
        let bit = ctx.require_bit(id)?;
        let category = self.taxonomy().get(bit.category())?;

        let capability = match step::check_role_capability(&category, ctx) {
            Ok(cap) => cap,
            Err(reason) => {
                tracing::info!(bit = %id, %reason, "step halted");
                return Ok(StepOutcome::Halted(reason));
            }
        };
        let handled = match step::dispatch(bit, &category, &event, ctx) {
            Ok(handled) => handled,
            Err(reason) => return Ok(StepOutcome::Halted(reason)),
        };

        let mut next_bit = bit.clone();
        next_bit.capabilities_used.insert(capability);
        if let Some(port) = category.inputs.first() {
            next_bit
                .io_state
                .inputs
                .insert(port.name.clone(), event.payload.clone());
        }
        if let Some(port) = category.outputs.first() {
            next_bit
                .io_state
                .outputs
                .insert(port.name.clone(), handled.output.payload.clone());
        }
        if let Some(verdict) = handled.verdict {
            next_bit.ethics_verdict = Some(verdict);
        }
        next_bit.touch();

        let mut next = ctx.clone();
        next.put_bit(next_bit.clone());
        next.record("step", Some(id), format!("{} -> {}", event.kind, handled.output.kind));
        next.emit(
            DomainEvent::for_bit(EventKind::BitStepped, id).with_payload(json!({
                "event": event.kind,
                "output": handled.output.kind,
            })),
        );
        Ok(StepOutcome::Advanced {
            bit: next_bit,
            outputs: vec![handled.output],
            ctx: next,
        })
    }

    // ------------------------------------------------------------------
    // retire
    // ------------------------------------------------------------------

    /// Remove the bit. Its edges stay as history.
    pub fn retire(&self, id: BitId, reason: &str, ctx: &Context) -> Result<Context> {
        let mut next = ctx.clone();
        next.remove_bit(id).ok_or_else(|| Error::bit_not_found(id))?;
        next.record("retire", Some(id), reason);
        next.emit(
            DomainEvent::for_bit(EventKind::BitRetired, id).with_payload(json!({ "reason": reason })),
        );
        Ok(next)
    }

    /// [`Protocol::retire`] then tell subscribers. A failed publish is logged
    /// and does not undo the retirement.
    pub fn retire_with_broadcast(
        &self,
        id: BitId,
        reason: &str,
        ctx: &Context,
        broadcaster: &dyn Broadcaster,
    ) -> Result<Context> {
        let next = self.retire(id, reason, ctx)?;
        let event = BroadcastEvent::BitRemoved {
            id,
            reason: reason.to_string(),
        };
        if let Err(e) = broadcaster.publish(event) {
            tracing::warn!(bit = %id, error = %e, "retirement broadcast failed");
        }
        Ok(next)
    }

    pub fn project(&self, ctx: &Context) -> GraphView {
        self.projector.graph(ctx)
    }

    /// Publish the full projection of `ctx`.
    pub fn publish_snapshot(
        &self,
        ctx: &Context,
        broadcaster: &dyn Broadcaster,
    ) -> std::result::Result<usize, PublishError> {
        broadcaster.publish(BroadcastEvent::Snapshot {
            graph: self.project(ctx),
        })
    }

    // ------------------------------------------------------------------
    // query / mutate
    // ------------------------------------------------------------------

    /// Field lookup; nested fields use dotted paths, e.g. `io_state.outputs.intent`.
    pub fn query(&self, bit: &Thunderbit, key: &str) -> Result<Value> {
        let doc = serde_json::to_value(bit)?;
        key.split('.')
            .try_fold(&doc, |node, part| node.get(part))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("field {}", key)))
    }

    pub fn query_keys(&self, bit: &Thunderbit, keys: &[&str]) -> Result<Map<String, Value>> {
        keys.iter()
            .map(|k| self.query(bit, k).map(|v| (k.to_string(), v)))
            .collect()
    }

    /// Merge `changes` into the bit. Protected fields are refused outright.
    pub fn mutate(
        &self,
        id: BitId,
        changes: Map<String, Value>,
        ctx: &Context,
    ) -> Result<(Thunderbit, Context)> {
        if let Some(field) = changes.keys().find(|k| PROTECTED_FIELDS.contains(&k.as_str())) {
            return Err(Error::Forbidden(field.clone()));
        }
        let original = ctx.require_bit(id)?;

        let mut doc = match serde_json::to_value(original)? {
            Value::Object(map) => map,
            _ => return Err(Error::invalid_attribute("bit", "not an object")),
        };
        let mut bit = original.clone();
        for (field, value) in &changes {
            if !doc.contains_key(field) {
                return Err(Error::invalid_attribute(field, "unknown field"));
            }
            doc.insert(field.clone(), value.clone());
            bit = serde_json::from_value(Value::Object(doc.clone()))
                .map_err(|e| Error::invalid_attribute(field, e.to_string()))?;
        }
        let mut bit = bit.with_identity_of(original);
        bit.validate()?;
        bit.touch();

        let fields: Vec<&String> = changes.keys().collect();
        let mut next = ctx.clone();
        next.put_bit(bit.clone());
        next.record("mutate", Some(id), format!("{:?}", fields));
        next.emit(
            DomainEvent::for_bit(EventKind::BitMutated, id).with_payload(json!({ "fields": fields })),
        );
        Ok((bit, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thunderbit_core::BitStatus;

    #[test]
    fn spawn_inherits_scope_owner() {
        let p = Protocol::default();
        let ctx = Context::new().with_owner("ada");
        let (bit, ctx) = p.spawn(CategoryId::Sensory, SpawnAttrs::new(), &ctx).unwrap();
        assert_eq!(bit.owner.as_deref(), Some("ada"));
        assert_eq!(bit.kind, Kind::WorldUpdate);
        assert!(ctx.contains(bit.id()));
    }

    #[test]
    fn spawn_rejects_out_of_range_salience() {
        let p = Protocol::default();
        let ctx = Context::new();
        let res = p.spawn(CategoryId::Sensory, SpawnAttrs::new().salience(2.0), &ctx);
        assert!(matches!(res, Err(Error::InvalidAttribute { .. })));
        assert_eq!(ctx.bit_count(), 0);
    }

    #[test]
    fn spawn_detached_returns_bit_only() {
        let p = Protocol::default();
        let bit = p
            .spawn_detached(CategoryId::Mnemonic, SpawnAttrs::new().tag("scratch"))
            .unwrap();
        assert_eq!(bit.kind, Kind::Memory);
        assert!(bit.tags.contains("scratch"));
    }

    #[test]
    fn query_walks_dotted_paths() {
        let p = Protocol::default();
        let bit = p
            .spawn_detached(CategoryId::Cognitive, SpawnAttrs::new().content(json!({"a": {"b": 3}})))
            .unwrap();
        assert_eq!(p.query(&bit, "content.a.b").unwrap(), json!(3));
        assert_eq!(p.query(&bit, "energy").unwrap(), json!(1.0));
        assert!(matches!(p.query(&bit, "content.a.z"), Err(Error::NotFound(_))));
    }

    #[test]
    fn mutate_touches_status() {
        let p = Protocol::default();
        let (bit, ctx) = p
            .spawn(CategoryId::Cognitive, SpawnAttrs::new(), &Context::new())
            .unwrap();
        let mut changes = Map::new();
        changes.insert("energy".into(), json!(0.4));
        let (bit2, _) = p.mutate(bit.id(), changes, &ctx).unwrap();
        assert_eq!(bit2.energy, 0.4);
        assert_eq!(bit2.status, BitStatus::Active);
    }
}
