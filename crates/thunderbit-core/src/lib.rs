//! Thunderbit Core - taxonomy, wiring rules, ethics gate and node types

pub mod bit;
pub mod category;
pub mod edge;
pub mod error;
pub mod ethics;
pub mod io;
pub mod taxonomy;
pub mod types;
pub mod wiring;

pub use bit::{InputEvent, IoState, Thunderbit, PROTECTED_FIELDS};
pub use category::{builtin_categories, Category, GeometryHint, PortSpec};
pub use edge::Edge;
pub use error::{Error, Result};
pub use ethics::{Decision, EthicsVerdict, Policy};
pub use io::PortBinding;
pub use taxonomy::{CategoryOverride, CategorySource, StaticOverrides, Taxonomy};
pub use types::*;
pub use wiring::{would_create_cycle, WiringRules, WiringValidator};
