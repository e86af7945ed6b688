//! Boundary core: validated boundary rules and resource matching.
mod error;
mod resource;
mod rule;
mod types;

pub use error::ConfigError;
pub use resource::{ResourcePattern, WILDCARD};
pub use rule::{parse_boundaries, BoundaryRule, LoadedBoundaries, RejectedBoundary};
pub use types::{
    overlay_id, ActionKind, ActionSpec, BoundaryKind, OverlayDisplay, OverlayKind, OverlaySpec,
    SelectorOptions, SelectorSpec, SelectorStrategy, StyleMap,
};
