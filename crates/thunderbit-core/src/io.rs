//! Port compatibility between producer and consumer categories

use crate::category::{Category, PortSpec};
use crate::error::{Error, Result};
use crate::taxonomy::Taxonomy;
use crate::types::{CategoryId, IoType, Shape};
use serde::{Deserialize, Serialize};

pub fn types_compatible(output: IoType, input: IoType) -> bool {
    output == input || output == IoType::Any || input == IoType::Any
}

/// A stream consumer takes any shape; otherwise shapes match or one is `Any`.
pub fn shapes_compatible(output: Shape, input: Shape) -> bool {
    output == input || output == Shape::Any || input == Shape::Any || input == Shape::Stream
}

pub fn port_compatible(output: &PortSpec, input: &PortSpec) -> bool {
    types_compatible(output.io_type, input.io_type) && shapes_compatible(output.shape, input.shape)
}

/// Which output port feeds which input port on a link.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    pub output: String,
    pub input: String,
}

/// Best compatible port pair, preferring exact type then exact shape matches.
pub fn bind_ports(from: &Category, to: &Category) -> Option<PortBinding> {
    let mut best: Option<(u8, &PortSpec, &PortSpec)> = None;
    for out in &from.outputs {
        for inp in &to.inputs {
            if !port_compatible(out, inp) {
                continue;
            }
            let score = u8::from(out.io_type == inp.io_type) * 2 + u8::from(out.shape == inp.shape);
            if best.map_or(true, |(s, _, _)| score > s) {
                best = Some((score, out, inp));
            }
        }
    }
    best.map(|(_, out, inp)| PortBinding {
        output: out.name.clone(),
        input: inp.name.clone(),
    })
}

/// Port binding between two categories or `IncompatibleIo`.
pub fn check_categories(taxonomy: &Taxonomy, from: CategoryId, to: CategoryId) -> Result<PortBinding> {
    let producer = taxonomy.get(from)?;
    let consumer = taxonomy.get(to)?;
    bind_ports(&producer, &consumer).ok_or(Error::IncompatibleIo { from, to })
}
