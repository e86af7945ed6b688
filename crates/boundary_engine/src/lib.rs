//! Boundary engine: page document, archive classification and boundary application.
mod boundary;
mod classify;
mod dispatch;
mod dom;
mod list;
mod mutate;
mod selector;
mod settings;
mod types;
mod worker_pool;

pub use boundary::Boundary;
pub use classify::{classify, is_network_url, CdxClassifier, Classifier, ClassifyError};
pub use dom::{Document, MutationRecord, OverlayElement, OverlayHandle, Rect, SearchRoot};
pub use list::{BoundaryList, BoundaryReport};
pub use mutate::{apply_styles_to_nodes, attach_overlay};
pub use selector::dedup_hrefs;
pub use settings::{default_pool_size, ArchiveEndpoint, EngineSettings};
pub use types::{EngineError, SelectorError};
pub use worker_pool::{TaskHandle, WorkerPool};
