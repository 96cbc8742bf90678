//! Publishing view-models to subscribers.

use crate::projection::GraphView;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use thunderbit_core::BitId;
use tokio::sync::broadcast;

/// Events emitted to every connected consumer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BroadcastEvent {
    /// A bit left the graph
    BitRemoved { id: BitId, reason: String },
    /// Full projection of a context
    Snapshot { graph: GraphView },
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("no subscribers")]
    NoSubscribers,

    #[error("publish failed: {0}")]
    Failed(String),
}

/// Anything that can fan events out to consumers.
pub trait Broadcaster: Send + Sync {
    /// Returns how many subscribers received the event.
    fn publish(&self, event: BroadcastEvent) -> Result<usize, PublishError>;
}

impl Broadcaster for broadcast::Sender<BroadcastEvent> {
    fn publish(&self, event: BroadcastEvent) -> Result<usize, PublishError> {
        self.send(event).map_err(|_| PublishError::NoSubscribers)
    }
}

/// A fresh channel with the usual buffer size.
pub fn channel() -> (broadcast::Sender<BroadcastEvent>, broadcast::Receiver<BroadcastEvent>) {
    broadcast::channel(1024)
}
