//! Slim view-models for external consumers.
//!
//! Only what a renderer needs leaves the protocol. Maxims, policies,
//! capability lists and ethics verdicts stay internal.

use crate::context::Context;
use serde::{Deserialize, Serialize};
use thunderbit_core::{BitId, BitStatus, Edge, EdgeId, Taxonomy, Thunderbit};

const ELLIPSIS: char = '…';

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeometryDto {
    #[serde(rename = "type")]
    pub kind: String,
    pub shape: String,
    pub base_color: String,
    pub position: Position,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkDto {
    pub target_id: BitId,
    pub relation_type: String,
    pub strength: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BitDto {
    pub id: BitId,
    pub category: String,
    pub role: String,
    pub label: String,
    pub tooltip: String,
    pub energy: f64,
    pub salience: f64,
    pub status: String,
    pub geometry: GeometryDto,
    pub links: Vec<LinkDto>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeDto {
    pub id: EdgeId,
    pub from_id: BitId,
    pub to_id: BitId,
    pub relation: String,
    pub strength: f64,
}

impl From<&Edge> for EdgeDto {
    fn from(edge: &Edge) -> Self {
        Self {
            id: edge.id(),
            from_id: edge.from_id(),
            to_id: edge.to_id(),
            relation: edge.relation().to_string(),
            strength: edge.strength(),
        }
    }
}

/// Whole-context projection, nodes ordered by creation time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphView {
    pub nodes: Vec<BitDto>,
    pub edges: Vec<EdgeDto>,
}

#[derive(Clone, Debug)]
pub struct Projector {
    taxonomy: Taxonomy,
    label_max_chars: usize,
    /// Active bits below this energy display as fading
    fading_energy: f64,
}

impl Default for Projector {
    fn default() -> Self {
        Self::new(Taxonomy::builtin(), 30, 0.15)
    }
}

impl Projector {
    pub fn new(taxonomy: Taxonomy, label_max_chars: usize, fading_energy: f64) -> Self {
        Self {
            taxonomy,
            label_max_chars,
            fading_energy,
        }
    }

    pub fn bit(&self, bit: &Thunderbit, ctx: &Context) -> BitDto {
        let geometry = match self.taxonomy.get(bit.category()) {
            Ok(cat) => GeometryDto {
                kind: cat.geometry.kind.clone(),
                shape: cat.geometry.shape.clone(),
                base_color: cat.geometry.base_color.clone(),
                position: position(bit),
            },
            // Disabled after spawn; still render something.
            Err(_) => GeometryDto {
                kind: "node".into(),
                shape: "sphere".into(),
                base_color: "#888888".into(),
                position: position(bit),
            },
        };
        let links = ctx
            .outgoing(bit.id())
            .filter(|e| ctx.contains(e.to_id()))
            .map(|e| LinkDto {
                target_id: e.to_id(),
                relation_type: e.relation().to_string(),
                strength: e.strength(),
            })
            .collect();

        BitDto {
            id: bit.id(),
            category: bit.category().to_string(),
            role: bit.role().to_string(),
            label: truncate_label(&label_source(bit), self.label_max_chars),
            tooltip: format!("{} {} ({})", bit.category(), bit.kind, bit.role()),
            energy: bit.energy,
            salience: bit.salience,
            status: self.display_status(bit).to_string(),
            geometry,
            links,
        }
    }

    pub fn graph(&self, ctx: &Context) -> GraphView {
        let mut bits: Vec<&Thunderbit> = ctx.bits().values().collect();
        bits.sort_by_key(|b| (b.created_at(), b.id()));
        let nodes = bits.into_iter().map(|b| self.bit(b, ctx)).collect();
        let edges = ctx
            .edges()
            .iter()
            .filter(|e| ctx.contains(e.from_id()) && ctx.contains(e.to_id()))
            .map(EdgeDto::from)
            .collect();
        GraphView { nodes, edges }
    }

    fn display_status(&self, bit: &Thunderbit) -> BitStatus {
        if bit.status == BitStatus::Active && bit.energy < self.fading_energy {
            BitStatus::Fading
        } else {
            bit.status
        }
    }
}

fn label_source(bit: &Thunderbit) -> String {
    match bit.content_text() {
        Some(text) if !text.trim().is_empty() => text.trim().to_string(),
        _ => bit.kind.to_string(),
    }
}

/// Cut to `max` characters and mark the cut with an ellipsis.
pub fn truncate_label(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push(ELLIPSIS);
    out
}

/// Stable placement: categories spread along x, energy lifts, salience pulls forward.
fn position(bit: &Thunderbit) -> Position {
    let lane = thunderbit_core::CategoryId::all()
        .iter()
        .position(|c| *c == bit.category())
        .unwrap_or(0);
    Position {
        x: lane as f64 * 10.0,
        y: bit.energy * 10.0,
        z: bit.salience * 10.0,
    }
}
