//! Turns a boundary's selector spec into the nodes it governs.
//!
//! CSS selectors resolve immediately. Link queries classify every `[href]`
//! candidate against the archive and keep the ones that are not archived:
//! the eager form waits for all answers and delivers once, in document
//! order; the lazy form waits for each candidate to enter the viewport and
//! delivers node by node.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use boundary_core::{SelectorSpec, SelectorStrategy};
use ego_tree::NodeId;

use crate::dispatch::Classification;
use crate::dom::{parse_selector, Document, SearchRoot};
use crate::types::{ClassifyEvent, ResolutionId};
use crate::SelectorError;

pub(crate) enum Outcome {
    /// Resolved without waiting.
    Ready(Vec<NodeId>),
    /// Waiting for classification answers.
    Pending,
    /// Candidates are watched for viewport intersection.
    Watching,
}

/// Nodes ready to be handed to their boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Delivery {
    pub boundary: usize,
    pub nodes: Vec<NodeId>,
    /// Part of the boundary's first application to the page.
    pub initial: bool,
    /// No further deliveries will follow for this resolution.
    pub finished: bool,
}

/// Distinct hrefs in first-seen order.
pub fn dedup_hrefs<'a>(hrefs: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    hrefs
        .into_iter()
        .filter(|href| seen.insert(*href))
        .map(str::to_string)
        .collect()
}

struct EagerQuery {
    boundary: usize,
    initial: bool,
    candidates: Vec<(NodeId, String)>,
    outstanding: HashSet<String>,
    results: HashMap<String, bool>,
}

enum HrefStatus {
    InFlight(Vec<NodeId>),
    Classified(bool),
}

struct LazyQuery {
    boundary: usize,
    use_worker: bool,
    /// Watches still waiting for the viewport.
    watching: usize,
    /// Hrefs with a classification outstanding.
    in_flight: usize,
    statuses: HashMap<String, HrefStatus>,
}

impl LazyQuery {
    /// Nothing can reach this resolution any more.
    fn is_settled(&self) -> bool {
        self.watching == 0 && self.in_flight == 0
    }
}

struct Watch {
    node: NodeId,
    href: String,
    resolution: ResolutionId,
}

pub(crate) struct SelectorEngine {
    next_id: ResolutionId,
    root_margin: f64,
    eager: HashMap<ResolutionId, EagerQuery>,
    lazy: HashMap<ResolutionId, LazyQuery>,
    watches: Vec<Watch>,
}

impl SelectorEngine {
    pub(crate) fn new(root_margin: f64) -> Self {
        Self {
            next_id: 0,
            root_margin,
            eager: HashMap::new(),
            lazy: HashMap::new(),
            watches: Vec::new(),
        }
    }

    pub(crate) fn resolve(
        &mut self,
        doc: &Document,
        root: SearchRoot,
        boundary: usize,
        spec: &SelectorSpec,
        initial: bool,
        router: &mut Classification,
    ) -> Result<Outcome, SelectorError> {
        match &spec.strategy {
            SelectorStrategy::CssSelector(query) => {
                let selector = parse_selector(query)?;
                Ok(Outcome::Ready(doc.query_selector_all(root, &selector)))
            }
            SelectorStrategy::LinkQuery | SelectorStrategy::LinkQueryLazy if spec.is_lazy() => {
                Ok(self.watch_links(doc, root, boundary, spec.uses_worker()))
            }
            SelectorStrategy::LinkQuery | SelectorStrategy::LinkQueryLazy => {
                Ok(self.query_links(doc, root, boundary, spec.uses_worker(), initial, router))
            }
        }
    }

    fn query_links(
        &mut self,
        doc: &Document,
        root: SearchRoot,
        boundary: usize,
        use_worker: bool,
        initial: bool,
        router: &mut Classification,
    ) -> Outcome {
        let candidates = doc.href_nodes(root);
        if candidates.is_empty() {
            return Outcome::Ready(Vec::new());
        }

        let unique = dedup_hrefs(candidates.iter().map(|(_, href)| href.as_str()));
        let id = self.next_resolution();
        for href in &unique {
            router.submit(id, href.clone(), use_worker);
        }
        self.eager.insert(
            id,
            EagerQuery {
                boundary,
                initial,
                candidates,
                outstanding: unique.into_iter().collect(),
                results: HashMap::new(),
            },
        );
        Outcome::Pending
    }

    fn watch_links(
        &mut self,
        doc: &Document,
        root: SearchRoot,
        boundary: usize,
        use_worker: bool,
    ) -> Outcome {
        let candidates = doc.href_nodes(root);
        if candidates.is_empty() {
            return Outcome::Watching;
        }

        let id = self.next_resolution();
        self.lazy.insert(
            id,
            LazyQuery {
                boundary,
                use_worker,
                watching: candidates.len(),
                in_flight: 0,
                statuses: HashMap::new(),
            },
        );
        self.watches
            .extend(candidates.into_iter().map(|(node, href)| Watch {
                node,
                href,
                resolution: id,
            }));
        Outcome::Watching
    }

    /// Records one classification answer.
    pub(crate) fn on_classified(&mut self, event: ClassifyEvent) -> Vec<Delivery> {
        if let Some(query) = self.eager.get_mut(&event.resolution) {
            if query.outstanding.remove(&event.href) {
                query.results.insert(event.href, event.present);
            }
            if !query.outstanding.is_empty() {
                return Vec::new();
            }
            let Some(EagerQuery {
                boundary,
                initial,
                candidates,
                results,
                ..
            }) = self.eager.remove(&event.resolution)
            else {
                return Vec::new();
            };
            // Archived links are in boundary; everything else is flagged.
            let nodes = candidates
                .into_iter()
                .filter(|(_, href)| !results.get(href).copied().unwrap_or(false))
                .map(|(node, _)| node)
                .collect();
            return vec![Delivery {
                boundary,
                nodes,
                initial,
                finished: true,
            }];
        }

        let Some(query) = self.lazy.get_mut(&event.resolution) else {
            return Vec::new();
        };
        let waiting = match query
            .statuses
            .insert(event.href, HrefStatus::Classified(event.present))
        {
            Some(HrefStatus::InFlight(nodes)) => {
                query.in_flight -= 1;
                nodes
            }
            _ => Vec::new(),
        };
        let boundary = query.boundary;
        self.release_if_settled(event.resolution);
        if event.present {
            return Vec::new();
        }
        waiting
            .into_iter()
            .map(|node| Delivery {
                boundary,
                nodes: vec![node],
                initial: false,
                finished: false,
            })
            .collect()
    }

    /// Starts classification for watched links that reached the viewport.
    ///
    /// Returns whether any watch fired, plus deliveries for links whose href
    /// was already known to be out of boundary.
    pub(crate) fn check_intersections(
        &mut self,
        doc: &Document,
        router: &mut Classification,
    ) -> (bool, Vec<Delivery>) {
        let margin = self.root_margin;
        let mut fired = Vec::new();
        self.watches.retain(|watch| {
            if doc.intersection_ratio(watch.node, margin) > 0.0 {
                fired.push((watch.node, watch.href.clone(), watch.resolution));
                false
            } else {
                true
            }
        });

        let any_fired = !fired.is_empty();
        let mut deliveries = Vec::new();
        let mut touched = HashSet::new();
        for (node, href, resolution) in fired {
            let Some(query) = self.lazy.get_mut(&resolution) else {
                continue;
            };
            touched.insert(resolution);
            query.watching -= 1;
            let boundary = query.boundary;
            let use_worker = query.use_worker;
            match query.statuses.entry(href) {
                Entry::Occupied(mut entry) => match entry.get_mut() {
                    HrefStatus::Classified(false) => deliveries.push(Delivery {
                        boundary,
                        nodes: vec![node],
                        initial: false,
                        finished: false,
                    }),
                    HrefStatus::Classified(true) => {}
                    HrefStatus::InFlight(nodes) => nodes.push(node),
                },
                Entry::Vacant(entry) => {
                    router.submit(resolution, entry.key().clone(), use_worker);
                    entry.insert(HrefStatus::InFlight(vec![node]));
                    query.in_flight += 1;
                }
            }
        }
        for resolution in touched {
            self.release_if_settled(resolution);
        }
        (any_fired, deliveries)
    }

    /// Stops watching nodes that left the document.
    pub(crate) fn forget_nodes(&mut self, removed: &HashSet<NodeId>) {
        let mut touched = HashSet::new();
        let lazy = &mut self.lazy;
        self.watches.retain(|watch| {
            if !removed.contains(&watch.node) {
                return true;
            }
            if let Some(query) = lazy.get_mut(&watch.resolution) {
                query.watching -= 1;
                touched.insert(watch.resolution);
            }
            false
        });
        for resolution in touched {
            self.release_if_settled(resolution);
        }
    }

    /// Whether any classification answer is still awaited.
    pub(crate) fn in_flight(&self) -> bool {
        !self.eager.is_empty() || self.lazy.values().any(|query| query.in_flight > 0)
    }

    pub(crate) fn watched_count(&self) -> usize {
        self.watches.len()
    }

    /// Resolutions still tracked, eager or lazy.
    pub(crate) fn open_resolutions(&self) -> usize {
        self.eager.len() + self.lazy.len()
    }

    fn release_if_settled(&mut self, resolution: ResolutionId) {
        if self.lazy.get(&resolution).is_some_and(LazyQuery::is_settled) {
            self.lazy.remove(&resolution);
        }
    }

    fn next_resolution(&mut self) -> ResolutionId {
        self.next_id += 1;
        self.next_id
    }
}
