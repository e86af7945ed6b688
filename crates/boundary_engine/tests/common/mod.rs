#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use boundary_core::{parse_boundaries, BoundaryRule};
use boundary_engine::{ArchiveEndpoint, Classifier, ClassifyError, EngineSettings};

/// In-memory archive that records every lookup it answers.
#[derive(Default)]
pub struct StubArchive {
    archived: HashSet<String>,
    delay: Option<Duration>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl StubArchive {
    pub fn with_archived<'a>(hrefs: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            archived: hrefs.into_iter().map(str::to_string).collect(),
            ..Self::default()
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Overrides the delay for one href.
    pub fn delay_for(mut self, href: &str, delay: Duration) -> Self {
        self.delays.insert(href.to_string(), delay);
        self
    }

    /// Hrefs in the order their lookups started.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Classifier for StubArchive {
    async fn lookup(&self, _archive: &ArchiveEndpoint, href: &str) -> Result<bool, ClassifyError> {
        self.calls.lock().unwrap().push(href.to_string());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(href).copied().or(self.delay) {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(self.archived.contains(href))
    }
}

pub fn settings() -> EngineSettings {
    EngineSettings {
        worker_pool_size: 2,
        classify_timeout: Duration::from_secs(5),
        ..EngineSettings::default()
    }
}

pub fn rules(json: &str) -> Vec<BoundaryRule> {
    let loaded = parse_boundaries(json).expect("boundary list parses");
    assert!(loaded.rejected.is_empty(), "rejected: {:?}", loaded.rejected);
    loaded.rules
}

pub fn stub(archive: StubArchive) -> Arc<StubArchive> {
    Arc::new(archive)
}
