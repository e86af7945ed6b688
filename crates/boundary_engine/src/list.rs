use std::collections::{BTreeSet, HashSet};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use boundary_core::{parse_boundaries, BoundaryRule, RejectedBoundary};
use boundary_logging::{boundary_debug, boundary_info, boundary_warn};
use ego_tree::NodeId;
use serde::Serialize;

use crate::dispatch::Classification;
use crate::dom::{Document, MutationRecord, SearchRoot};
use crate::mutate::apply_styles_to_nodes;
use crate::selector::{Delivery, Outcome, SelectorEngine};
use crate::types::ClassifyEvent;
use crate::{Boundary, CdxClassifier, Classifier, EngineError, EngineSettings};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

type LoadedCallback = Box<dyn FnMut(&Boundary)>;
type CompleteCallback = Box<dyn FnOnce()>;

/// Summary of one boundary, as a sidebar would show it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundaryReport {
    pub idx: usize,
    pub resource: String,
    pub kind: &'static str,
    pub selector: &'static str,
    pub action: &'static str,
    pub description: String,
    pub affected_nodes: usize,
    pub overlays: Vec<String>,
}

/// Owns the configured boundaries and applies them to a page.
///
/// All document work happens on the thread that calls
/// [`BoundaryList::apply_boundaries`] and [`BoundaryList::pump`];
/// classification runs elsewhere and is folded back in by `pump`.
pub struct BoundaryList {
    boundaries: Vec<Boundary>,
    rejected: Vec<RejectedBoundary>,
    selector: SelectorEngine,
    classification: Classification,
    event_rx: mpsc::Receiver<ClassifyEvent>,
    observed: Vec<usize>,
    pending: BTreeSet<usize>,
    applying: bool,
    on_boundary_loaded: Option<LoadedCallback>,
    on_all_complete: Option<CompleteCallback>,
}

impl BoundaryList {
    /// Builds a list that classifies against the settings' archive over HTTP.
    pub fn new(rules: Vec<BoundaryRule>, settings: EngineSettings) -> Result<Self, EngineError> {
        let classifier = CdxClassifier::new(&settings)?;
        Ok(Self::with_classifier(rules, settings, Arc::new(classifier)))
    }

    pub fn with_classifier(
        rules: Vec<BoundaryRule>,
        settings: EngineSettings,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel();
        let boundaries = rules
            .into_iter()
            .enumerate()
            .map(|(idx, rule)| Boundary::new(idx, rule))
            .collect();

        Self {
            boundaries,
            rejected: Vec::new(),
            selector: SelectorEngine::new(settings.lazy_root_margin),
            classification: Classification::new(classifier, &settings, event_tx),
            event_rx,
            observed: Vec::new(),
            pending: BTreeSet::new(),
            applying: false,
            on_boundary_loaded: None,
            on_all_complete: None,
        }
    }

    /// Parses a JSON list of records, skipping the invalid ones.
    pub fn from_json(
        json: &str,
        settings: EngineSettings,
        classifier: Arc<dyn Classifier>,
    ) -> Result<Self, EngineError> {
        let loaded = parse_boundaries(json)?;
        for rejected in &loaded.rejected {
            boundary_warn!(
                "Skipping boundary record {}: {}",
                rejected.position,
                rejected.error
            );
        }
        let mut list = Self::with_classifier(loaded.rules, settings, classifier);
        list.rejected = loaded.rejected;
        Ok(list)
    }

    pub fn boundaries(&self) -> &[Boundary] {
        &self.boundaries
    }

    pub fn boundary(&self, idx: usize) -> Option<&Boundary> {
        self.boundaries.get(idx)
    }

    /// Records that were skipped at construction.
    pub fn rejected(&self) -> &[RejectedBoundary] {
        &self.rejected
    }

    /// Shows or hides one overlay spec of one boundary.
    pub fn update_overlays(
        &self,
        doc: &mut Document,
        idx: usize,
        overlay_id: &str,
        visible: bool,
    ) -> bool {
        self.boundaries
            .get(idx)
            .is_some_and(|boundary| boundary.update_overlays(doc, overlay_id, visible))
    }

    /// Whether classification answers are still awaited.
    pub fn is_busy(&self) -> bool {
        self.selector.in_flight()
    }

    /// Lazy link candidates that have not reached the viewport yet.
    pub fn watched_links(&self) -> usize {
        self.selector.watched_count()
    }

    /// Link-query resolutions still holding state.
    pub fn open_resolutions(&self) -> usize {
        self.selector.open_resolutions()
    }

    /// The worker pool, if any boundary has used it so far.
    pub fn pool_started(&self) -> bool {
        self.classification.pool_started()
    }

    pub fn report(&self) -> Vec<BoundaryReport> {
        self.boundaries
            .iter()
            .map(|boundary| {
                let rule = boundary.rule();
                BoundaryReport {
                    idx: boundary.idx(),
                    resource: rule.resource.as_str().to_string(),
                    kind: rule.kind.as_str(),
                    selector: rule.selector.strategy.type_name(),
                    action: rule.action.kind.as_str(),
                    description: rule.description.clone(),
                    affected_nodes: boundary.affected_nodes().len(),
                    overlays: boundary.overlay_divs().keys().cloned().collect(),
                }
            })
            .collect()
    }

    /// Applies every boundary to `doc`.
    ///
    /// `on_boundary_loaded` fires once per boundary as its first application
    /// settles, in completion order. `on_all_complete` fires exactly once,
    /// after every non-lazy boundary has settled; lazy boundaries never hold
    /// it back. Mutation-observer boundaries keep applying to nodes inserted
    /// later, as [`BoundaryList::pump`] sees them.
    pub fn apply_boundaries(
        &mut self,
        doc: &mut Document,
        on_boundary_loaded: impl FnMut(&Boundary) + 'static,
        on_all_complete: impl FnOnce() + 'static,
    ) {
        self.on_boundary_loaded = Some(Box::new(on_boundary_loaded));
        self.on_all_complete = Some(Box::new(on_all_complete));
        self.observed.clear();
        self.pending.clear();

        let page_url = doc.url().to_string();
        let mut matched = Vec::new();
        for (idx, boundary) in self.boundaries.iter().enumerate() {
            let rule = boundary.rule();
            if !rule.resource.matches(&page_url) {
                boundary_debug!(
                    "Boundary {} ({}) does not match {}",
                    idx,
                    rule.resource,
                    page_url
                );
                continue;
            }
            if rule.is_observer() {
                self.observed.push(idx);
            }
            if !rule.selector.is_lazy() {
                self.pending.insert(idx);
            }
            matched.push(idx);
        }

        let root = SearchRoot::descendants_of(doc.body());
        self.applying = true;
        for idx in 0..self.boundaries.len() {
            if matched.contains(&idx) {
                self.apply_boundary(doc, idx, root, true);
            } else {
                self.notify_loaded(idx);
            }
        }
        self.applying = false;

        doc.observe_mutations(!self.observed.is_empty());
        if !self.observed.is_empty() {
            boundary_debug!("Observing mutations for boundaries {:?}", self.observed);
        }
        boundary_info!(
            "Applied {} of {} boundaries to {}",
            matched.len(),
            self.boundaries.len(),
            page_url
        );
        self.check_all_complete();
    }

    /// Folds in everything that happened since the last call: worker
    /// results, DOM mutations, viewport changes and classification answers.
    ///
    /// Returns whether any work was done.
    pub fn pump(&mut self, doc: &mut Document) -> bool {
        let mut progressed = self.classification.poll_pool() > 0;

        let mutations = doc.take_mutations();
        progressed |= !mutations.is_empty();
        for record in mutations {
            self.handle_mutation(doc, record);
        }

        let (fired, deliveries) = self.selector.check_intersections(doc, &mut self.classification);
        progressed |= fired;
        for delivery in deliveries {
            self.deliver(doc, delivery);
        }

        while let Ok(event) = self.event_rx.try_recv() {
            self.handle_classified(doc, event);
            progressed = true;
        }
        progressed
    }

    /// Pumps until no classification is in flight or `timeout` passes.
    ///
    /// Returns true when the engine went idle.
    pub fn run_until_idle(&mut self, doc: &mut Document, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump(doc);
            if !self.selector.in_flight() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            if let Ok(event) = self.event_rx.recv_timeout(POLL_INTERVAL.min(deadline - now)) {
                self.handle_classified(doc, event);
            }
        }
    }

    fn apply_boundary(&mut self, doc: &mut Document, idx: usize, root: SearchRoot, initial: bool) {
        let outcome = self.selector.resolve(
            doc,
            root,
            idx,
            &self.boundaries[idx].rule().selector,
            initial,
            &mut self.classification,
        );
        match outcome {
            Ok(Outcome::Ready(nodes)) => {
                self.commit(doc, idx, &nodes);
                if initial {
                    self.finish_initial(idx);
                }
            }
            Ok(Outcome::Pending) => {}
            Ok(Outcome::Watching) => {
                if initial {
                    self.finish_initial(idx);
                }
            }
            Err(err) => {
                boundary_warn!("Boundary {} could not be resolved: {}", idx, err);
                if initial {
                    self.finish_initial(idx);
                }
            }
        }
    }

    /// Styles the nodes, records them and draws overlays for the new ones.
    fn commit(&mut self, doc: &mut Document, idx: usize, nodes: &[NodeId]) {
        let nodes: Vec<NodeId> = nodes
            .iter()
            .copied()
            .filter(|node| doc.is_connected(*node))
            .collect();
        let boundary = &mut self.boundaries[idx];
        apply_styles_to_nodes(doc, &nodes, &boundary.action().effective_style());
        let added = boundary.push_added_nodes(&nodes);
        if !added.is_empty() {
            boundary.create_overlays(doc, &added);
        }
        boundary_debug!(
            "Boundary {} now governs {} nodes ({} new)",
            idx,
            boundary.affected_nodes().len(),
            added.len()
        );
    }

    fn deliver(&mut self, doc: &mut Document, delivery: Delivery) {
        self.commit(doc, delivery.boundary, &delivery.nodes);
        if delivery.initial && delivery.finished {
            self.finish_initial(delivery.boundary);
        }
    }

    fn handle_classified(&mut self, doc: &mut Document, event: ClassifyEvent) {
        for delivery in self.selector.on_classified(event) {
            self.deliver(doc, delivery);
        }
    }

    fn handle_mutation(&mut self, doc: &mut Document, record: MutationRecord) {
        if self.observed.is_empty() || !doc.contains(doc.body(), record.target) {
            return;
        }
        let observed = self.observed.clone();

        for node in &record.added {
            for idx in &observed {
                self.apply_boundary(doc, *idx, SearchRoot::subtree(*node), false);
            }
        }

        if record.removed.is_empty() {
            return;
        }
        let removed: Vec<NodeId> = record
            .removed
            .iter()
            .flat_map(|node| doc.subtree(*node))
            .collect();
        let removed_set: HashSet<NodeId> = removed.iter().copied().collect();
        for idx in &observed {
            let boundary = &mut self.boundaries[*idx];
            boundary.clear_removed_nodes(&removed);
            boundary.drop_overlays_for(doc, &removed_set);
        }
        self.selector.forget_nodes(&removed_set);
    }

    fn finish_initial(&mut self, idx: usize) {
        self.notify_loaded(idx);
        self.pending.remove(&idx);
        self.check_all_complete();
    }

    fn notify_loaded(&mut self, idx: usize) {
        if let Some(callback) = self.on_boundary_loaded.as_mut() {
            callback(&self.boundaries[idx]);
        }
    }

    fn check_all_complete(&mut self) {
        if self.applying || !self.pending.is_empty() {
            return;
        }
        if let Some(callback) = self.on_all_complete.take() {
            boundary_info!("All boundaries loaded");
            callback();
        }
    }
}
