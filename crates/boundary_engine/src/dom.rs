//! In-process page document: the engine's stand-in for the browser DOM.
//!
//! Nodes are addressed by [`NodeId`]; identity of a node is identity of its
//! id. All reads and writes happen on the thread that owns the document.

use std::collections::HashMap;

use boundary_core::StyleMap;
use ego_tree::{NodeId, NodeRef, Tree};
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::SelectorError;

const HREF_SELECTOR: &str = "[href]";

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Grows the rect by `margin` on every side.
    pub fn expand(&self, margin: f64) -> Self {
        Self::new(
            self.x - margin,
            self.y - margin,
            self.width + 2.0 * margin,
            self.height + 2.0 * margin,
        )
    }

    /// Share of `self` that lies inside `root`, in `0.0..=1.0`.
    ///
    /// A zero-area rect inside `root` counts as fully visible; rects that
    /// only touch an edge of `root` do not intersect.
    pub fn intersection_ratio(&self, root: &Rect) -> f64 {
        let overlap_x = self.right().min(root.right()) - self.x.max(root.x);
        let overlap_y = self.bottom().min(root.bottom()) - self.y.max(root.y);
        if overlap_x < 0.0 || overlap_y < 0.0 {
            return 0.0;
        }
        let area = self.width * self.height;
        if area <= 0.0 {
            return 1.0;
        }
        (overlap_x * overlap_y / area).clamp(0.0, 1.0)
    }
}

/// Where a query starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchRoot {
    pub node: NodeId,
    pub include_self: bool,
}

impl SearchRoot {
    /// Matches below `node` only, like `querySelectorAll`.
    pub fn descendants_of(node: NodeId) -> Self {
        Self {
            node,
            include_self: false,
        }
    }

    /// Matches `node` itself as well; used for freshly inserted nodes.
    pub fn subtree(node: NodeId) -> Self {
        Self {
            node,
            include_self: true,
        }
    }
}

/// One child-list change, reported while mutation observation is on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

/// Refers to one overlay in a document's overlay layer.
///
/// Slots are reused after [`Document::detach_overlay`]; the generation keeps
/// a stale handle from reaching the slot's next occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OverlayHandle {
    slot: usize,
    generation: u32,
}

#[derive(Debug, Default)]
struct OverlaySlot {
    generation: u32,
    overlay: Option<OverlayElement>,
}

/// An overlay drawn over a host node.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayElement {
    pub host: NodeId,
    pub class_name: String,
    pub description: Option<String>,
    pub styles: StyleMap,
}

impl OverlayElement {
    pub fn style(&self, property: &str) -> Option<&str> {
        self.styles.get(property).map(String::as_str)
    }

    pub fn is_visible(&self) -> bool {
        self.style("opacity") != Some("0")
    }
}

pub struct Document {
    url: String,
    base: Option<Url>,
    html: Html,
    body: NodeId,
    styles: HashMap<NodeId, StyleMap>,
    layout: HashMap<NodeId, Rect>,
    viewport: Rect,
    overlays: Vec<OverlaySlot>,
    free_slots: Vec<usize>,
    observe_mutations: bool,
    mutations: Vec<MutationRecord>,
}

impl Document {
    pub fn parse(url: impl Into<String>, html: &str) -> Self {
        let url = url.into();
        let html = Html::parse_document(html);
        let body = Selector::parse("body")
            .ok()
            .and_then(|selector| html.select(&selector).next())
            .map(node_id)
            .unwrap_or_else(|| node_id(html.root_element()));

        Self {
            base: Url::parse(&url).ok(),
            url,
            html,
            body,
            styles: HashMap::new(),
            layout: HashMap::new(),
            viewport: Rect::new(0.0, 0.0, 1280.0, 800.0),
            overlays: Vec::new(),
            free_slots: Vec::new(),
            observe_mutations: false,
            mutations: Vec::new(),
        }
    }

    /// The page URL, as `window.location.href` would report it.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn element(&self, node: NodeId) -> Option<ElementRef<'_>> {
        self.html.tree.get(node).and_then(ElementRef::wrap)
    }

    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.html
            .tree
            .nodes()
            .filter_map(ElementRef::wrap)
            .filter(|element| element.value().id() == Some(id))
            .map(node_id)
            .find(|node| self.is_connected(*node))
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?.value().attr(name)
    }

    /// Parses `css` and returns the matching descendants of the body.
    pub fn select(&self, css: &str) -> Result<Vec<NodeId>, SelectorError> {
        let selector = parse_selector(css)?;
        Ok(self.query_selector_all(SearchRoot::descendants_of(self.body), &selector))
    }

    /// Matching elements under `root`, in document order.
    pub fn query_selector_all(&self, root: SearchRoot, selector: &Selector) -> Vec<NodeId> {
        let Some(start) = self.html.tree.get(root.node) else {
            return Vec::new();
        };
        start
            .descendants()
            .filter(|node| root.include_self || node.id() != root.node)
            .filter_map(ElementRef::wrap)
            .filter(|element| selector.matches(element))
            .map(node_id)
            .collect()
    }

    /// Every `[href]` element under `root` with its resolved href, in
    /// document order.
    pub fn href_nodes(&self, root: SearchRoot) -> Vec<(NodeId, String)> {
        let Ok(selector) = Selector::parse(HREF_SELECTOR) else {
            return Vec::new();
        };
        self.query_selector_all(root, &selector)
            .into_iter()
            .filter_map(|node| {
                let raw = self.attr(node, "href")?;
                Some((node, self.resolve_href(raw)))
            })
            .collect()
    }

    /// Resolves an `href` attribute against the page URL.
    pub fn resolve_href(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        if let Ok(url) = Url::parse(trimmed) {
            return url.into();
        }
        self.base
            .as_ref()
            .and_then(|base| base.join(trimmed).ok())
            .map(String::from)
            .unwrap_or_else(|| trimmed.to_string())
    }

    pub fn set_style(&mut self, node: NodeId, property: &str, value: &str) {
        self.styles
            .entry(node)
            .or_default()
            .insert(property.to_string(), value.to_string());
    }

    /// Applied style first, then the markup's inline `style` attribute.
    pub fn style(&self, node: NodeId, property: &str) -> Option<String> {
        if let Some(value) = self.styles.get(&node).and_then(|styles| styles.get(property)) {
            return Some(value.clone());
        }
        self.attr(node, "style")?
            .split(';')
            .filter_map(|declaration| declaration.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case(property))
            .map(|(_, value)| value.trim().to_string())
    }

    /// Pins the rendered geometry of a node.
    pub fn set_layout(&mut self, node: NodeId, rect: Rect) {
        self.layout.insert(node, rect);
    }

    /// Rendered box of a node: pinned layout, else its `left/top/width/height`.
    pub fn bounding_rect(&self, node: NodeId) -> Rect {
        if let Some(rect) = self.layout.get(&node) {
            return *rect;
        }
        let px = |property: &str| {
            self.style(node, property)
                .as_deref()
                .and_then(parse_px)
                .unwrap_or(0.0)
        };
        Rect::new(px("left"), px("top"), px("width"), px("height"))
    }

    pub fn viewport(&self) -> Rect {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Rect) {
        self.viewport = viewport;
    }

    pub fn scroll_to(&mut self, x: f64, y: f64) {
        self.viewport.x = x;
        self.viewport.y = y;
    }

    /// How much of `node` is inside the viewport grown by `root_margin`.
    pub fn intersection_ratio(&self, node: NodeId, root_margin: f64) -> f64 {
        if !self.is_connected(node) {
            return 0.0;
        }
        self.bounding_rect(node)
            .intersection_ratio(&self.viewport.expand(root_margin))
    }

    /// Parses `fragment` and appends its top-level nodes to `parent`.
    pub fn append_html(&mut self, parent: NodeId, fragment: &str) -> Vec<NodeId> {
        let parsed = Html::parse_fragment(fragment);
        let added: Vec<NodeId> = parsed
            .root_element()
            .children()
            .filter_map(|child| graft(&mut self.html.tree, parent, child))
            .collect();

        if self.observe_mutations && !added.is_empty() {
            self.mutations.push(MutationRecord {
                target: parent,
                added: added.clone(),
                removed: Vec::new(),
            });
        }
        added
    }

    /// Detaches `node` and its subtree. The body and the root stay put.
    pub fn remove(&mut self, node: NodeId) -> bool {
        if node == self.body || node == self.html.tree.root().id() {
            return false;
        }
        let Some(parent) = self
            .html
            .tree
            .get(node)
            .and_then(|n| n.parent())
            .map(|p| p.id())
        else {
            return false;
        };
        let Some(mut target) = self.html.tree.get_mut(node) else {
            return false;
        };
        target.detach();

        if self.observe_mutations {
            self.mutations.push(MutationRecord {
                target: parent,
                added: Vec::new(),
                removed: vec![node],
            });
        }
        true
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        self.contains(self.html.tree.root().id(), node)
    }

    /// Whether `node` is `ancestor` or one of its descendants.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        match self.html.tree.get(node) {
            Some(n) => n.id() == ancestor || n.ancestors().any(|a| a.id() == ancestor),
            None => false,
        }
    }

    /// `node` followed by all of its descendants, attached or not.
    pub fn subtree(&self, node: NodeId) -> Vec<NodeId> {
        self.html
            .tree
            .get(node)
            .map(|n| n.descendants().map(|d| d.id()).collect())
            .unwrap_or_default()
    }

    pub(crate) fn observe_mutations(&mut self, enabled: bool) {
        self.observe_mutations = enabled;
        if !enabled {
            self.mutations.clear();
        }
    }

    pub(crate) fn take_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.mutations)
    }

    pub fn attach_overlay(
        &mut self,
        host: NodeId,
        class_name: &str,
        description: Option<String>,
        styles: StyleMap,
    ) -> OverlayHandle {
        let overlay = OverlayElement {
            host,
            class_name: class_name.to_string(),
            description,
            styles,
        };
        let slot = match self.free_slots.pop() {
            Some(slot) => slot,
            None => {
                self.overlays.push(OverlaySlot::default());
                self.overlays.len() - 1
            }
        };
        let entry = &mut self.overlays[slot];
        entry.overlay = Some(overlay);
        OverlayHandle {
            slot,
            generation: entry.generation,
        }
    }

    pub fn overlay(&self, handle: OverlayHandle) -> Option<&OverlayElement> {
        self.overlays
            .get(handle.slot)
            .filter(|entry| entry.generation == handle.generation)
            .and_then(|entry| entry.overlay.as_ref())
    }

    /// Attached overlays, in slot order.
    pub fn overlays(&self) -> impl Iterator<Item = &OverlayElement> {
        self.overlays.iter().filter_map(|entry| entry.overlay.as_ref())
    }

    pub fn set_overlay_style(&mut self, handle: OverlayHandle, property: &str, value: &str) {
        if let Some(overlay) = self.overlay_mut(handle) {
            overlay
                .styles
                .insert(property.to_string(), value.to_string());
        }
    }

    /// Removes the overlay and frees its slot for reuse.
    pub fn detach_overlay(&mut self, handle: OverlayHandle) {
        let Some(entry) = self
            .overlays
            .get_mut(handle.slot)
            .filter(|entry| entry.generation == handle.generation && entry.overlay.is_some())
        else {
            return;
        };
        entry.overlay = None;
        entry.generation = entry.generation.wrapping_add(1);
        self.free_slots.push(handle.slot);
    }

    /// Slots held by the overlay layer, attached or free.
    pub fn overlay_capacity(&self) -> usize {
        self.overlays.len()
    }

    fn overlay_mut(&mut self, handle: OverlayHandle) -> Option<&mut OverlayElement> {
        self.overlays
            .get_mut(handle.slot)
            .filter(|entry| entry.generation == handle.generation)
            .and_then(|entry| entry.overlay.as_mut())
    }
}

pub(crate) fn parse_selector(css: &str) -> Result<Selector, SelectorError> {
    Selector::parse(css).map_err(|err| SelectorError::InvalidSelector {
        query: css.to_string(),
        reason: format!("{err:?}"),
    })
}

fn node_id(element: ElementRef<'_>) -> NodeId {
    let node: NodeRef<'_, Node> = *element;
    node.id()
}

/// Deep-copies `source` under `parent`, returning the new node's id.
fn graft(tree: &mut Tree<Node>, parent: NodeId, source: NodeRef<'_, Node>) -> Option<NodeId> {
    let id = tree.get_mut(parent)?.append(source.value().clone()).id();
    for child in source.children() {
        graft(tree, id, child);
    }
    Some(id)
}

fn parse_px(value: &str) -> Option<f64> {
    let value = value.trim();
    value
        .strip_suffix("px")
        .unwrap_or(value)
        .trim()
        .parse()
        .ok()
}
