use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// CSS property name to value.
pub type StyleMap = BTreeMap<String, String>;

const POINTER_EVENTS: &str = "pointer-events";

/// Builds the DOM id for one overlay spec of one boundary.
pub fn overlay_id(boundary_idx: usize, overlay_idx: usize) -> String {
    format!("overlay-display-{boundary_idx}{overlay_idx}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoundaryKind {
    /// Applied once to the document as loaded.
    OnLoad,
    /// Applied once, then again to every node inserted afterwards.
    MutationObserver,
}

impl BoundaryKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "on-load" => Some(Self::OnLoad),
            "mutation-observer" | "observer" => Some(Self::MutationObserver),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BoundaryKind::OnLoad => "on-load",
            BoundaryKind::MutationObserver => "mutation-observer",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorOptions {
    #[serde(rename = "lazy-loading", default)]
    pub lazy_loading: bool,
    #[serde(default)]
    pub worker: bool,
}

/// How the nodes governed by a boundary are discovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorStrategy {
    CssSelector(String),
    LinkQuery,
    LinkQueryLazy,
}

impl SelectorStrategy {
    pub fn type_name(&self) -> &'static str {
        match self {
            SelectorStrategy::CssSelector(_) => "css-selector",
            SelectorStrategy::LinkQuery => "link-query",
            SelectorStrategy::LinkQueryLazy => "link-query-lazy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorSpec {
    pub strategy: SelectorStrategy,
    pub options: SelectorOptions,
}

impl SelectorSpec {
    /// Link classification waits for each candidate to reach the viewport.
    pub fn is_lazy(&self) -> bool {
        match self.strategy {
            SelectorStrategy::LinkQueryLazy => true,
            SelectorStrategy::LinkQuery => self.options.lazy_loading,
            SelectorStrategy::CssSelector(_) => false,
        }
    }

    pub fn uses_worker(&self) -> bool {
        self.options.worker
    }

    pub fn query(&self) -> Option<&str> {
        match &self.strategy {
            SelectorStrategy::CssSelector(query) => Some(query),
            SelectorStrategy::LinkQuery | SelectorStrategy::LinkQueryLazy => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    None,
    Disable,
    Style,
}

impl ActionKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(Self::None),
            "disable" => Some(Self::Disable),
            "style" => Some(Self::Style),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::None => "none",
            ActionKind::Disable => "disable",
            ActionKind::Style => "style",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSpec {
    pub kind: ActionKind,
    pub style: StyleMap,
}

impl ActionSpec {
    /// Style written onto every affected node.
    ///
    /// `disable` always carries `pointer-events: none`, on top of any style
    /// given alongside it.
    pub fn effective_style(&self) -> StyleMap {
        match self.kind {
            ActionKind::None => StyleMap::new(),
            ActionKind::Style => self.style.clone(),
            ActionKind::Disable => {
                let mut style = self.style.clone();
                style.insert(POINTER_EVENTS.to_string(), "none".to_string());
                style
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlayKind {
    Box,
    Tooltip,
}

impl OverlayKind {
    pub fn class_name(&self) -> &'static str {
        match self {
            OverlayKind::Box => "overlay",
            OverlayKind::Tooltip => "overlay-tooltip",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlayDisplay {
    Visible,
    #[default]
    #[serde(alias = "none")]
    Hidden,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OverlaySpec {
    #[serde(rename = "type")]
    pub kind: OverlayKind,
    #[serde(default)]
    pub display: OverlayDisplay,
    #[serde(default, deserialize_with = "style_values")]
    pub styles: StyleMap,
}

impl OverlaySpec {
    pub fn is_visible(&self) -> bool {
        self.display == OverlayDisplay::Visible
    }
}

/// Accepts `{"opacity": 0.5, "color": "red"}` style objects.
fn style_values<'de, D>(deserializer: D) -> Result<StyleMap, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Value>> = Option::deserialize(deserializer)?;
    Ok(raw.map(style_map_from).unwrap_or_default())
}

pub(crate) fn style_map_from(raw: BTreeMap<String, Value>) -> StyleMap {
    raw.into_iter()
        .map(|(property, value)| {
            let value = match value {
                Value::String(text) => text,
                other => other.to_string(),
            };
            (property, value)
        })
        .collect()
}
