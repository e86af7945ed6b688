use thiserror::Error;

use crate::ClassifyError;

/// Identifies one run of the selector engine for one boundary.
pub(crate) type ResolutionId = u64;

/// A classification answer on its way back to the owning thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ClassifyEvent {
    pub resolution: ResolutionId,
    pub href: String,
    pub present: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("invalid css selector `{query}`: {reason}")]
    InvalidSelector { query: String, reason: String },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to build archive classifier: {0}")]
    Classifier(#[from] ClassifyError),
    #[error(transparent)]
    Config(#[from] boundary_core::ConfigError),
}
