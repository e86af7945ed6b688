use std::collections::{BTreeMap, HashSet};

use boundary_core::{overlay_id, ActionSpec, BoundaryRule};
use ego_tree::NodeId;

use crate::dom::{Document, OverlayHandle};
use crate::mutate::{attach_overlay, opacity};

/// A boundary rule applied to a page, with the nodes it currently governs.
#[derive(Debug, Clone)]
pub struct Boundary {
    idx: usize,
    rule: BoundaryRule,
    affected_nodes: Vec<NodeId>,
    overlay_divs: BTreeMap<String, Vec<OverlayHandle>>,
}

impl Boundary {
    pub fn new(idx: usize, rule: BoundaryRule) -> Self {
        let overlay_divs = (0..rule.overlays.len())
            .map(|overlay_idx| (overlay_id(idx, overlay_idx), Vec::new()))
            .collect();
        Self {
            idx,
            rule,
            affected_nodes: Vec::new(),
            overlay_divs,
        }
    }

    /// Position in the owning list.
    pub fn idx(&self) -> usize {
        self.idx
    }

    pub fn rule(&self) -> &BoundaryRule {
        &self.rule
    }

    pub fn description(&self) -> &str {
        &self.rule.description
    }

    pub fn action(&self) -> &ActionSpec {
        &self.rule.action
    }

    pub fn affected_nodes(&self) -> &[NodeId] {
        &self.affected_nodes
    }

    pub fn overlay_divs(&self) -> &BTreeMap<String, Vec<OverlayHandle>> {
        &self.overlay_divs
    }

    /// Adds nodes not yet governed, returning the ones that were new.
    pub fn push_added_nodes(&mut self, nodes: &[NodeId]) -> Vec<NodeId> {
        let mut added = Vec::new();
        for node in nodes {
            if !self.affected_nodes.contains(node) {
                self.affected_nodes.push(*node);
                added.push(*node);
            }
        }
        added
    }

    /// Drops any of `nodes` from the governed set.
    pub fn clear_removed_nodes(&mut self, nodes: &[NodeId]) {
        let removed: HashSet<&NodeId> = nodes.iter().collect();
        self.affected_nodes.retain(|node| !removed.contains(node));
    }

    /// Shows or hides every overlay created for `overlay_id`.
    ///
    /// Returns false when the boundary has no such overlay spec.
    pub fn update_overlays(&self, doc: &mut Document, overlay_id: &str, visible: bool) -> bool {
        let Some(handles) = self.overlay_divs.get(overlay_id) else {
            return false;
        };
        for handle in handles {
            doc.set_overlay_style(*handle, "opacity", opacity(visible));
        }
        true
    }

    /// Draws this boundary's overlays over `nodes`.
    pub(crate) fn create_overlays(&mut self, doc: &mut Document, nodes: &[NodeId]) {
        for (overlay_idx, spec) in self.rule.overlays.iter().enumerate() {
            let handles = self
                .overlay_divs
                .entry(overlay_id(self.idx, overlay_idx))
                .or_default();
            for node in nodes {
                handles.push(attach_overlay(doc, *node, spec, &self.rule.description));
            }
        }
    }

    /// Removes overlays whose host is one of `nodes`.
    pub(crate) fn drop_overlays_for(&mut self, doc: &mut Document, nodes: &HashSet<NodeId>) {
        for handles in self.overlay_divs.values_mut() {
            handles.retain(|handle| {
                let hosted_on_removed = doc
                    .overlay(*handle)
                    .is_some_and(|overlay| nodes.contains(&overlay.host));
                if hosted_on_removed {
                    doc.detach_overlay(*handle);
                }
                !hosted_on_removed
            });
        }
    }
}
