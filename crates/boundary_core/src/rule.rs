use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::types::style_map_from;
use crate::{
    ActionKind, ActionSpec, BoundaryKind, ConfigError, OverlaySpec, ResourcePattern,
    SelectorOptions, SelectorSpec, SelectorStrategy, StyleMap,
};

/// One validated boundary record.
///
/// Construction either yields a rule with every critical field present and
/// recognised, or a [`ConfigError`] naming the field that was not.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryRule {
    pub resource: ResourcePattern,
    pub kind: BoundaryKind,
    pub selector: SelectorSpec,
    pub action: ActionSpec,
    pub description: String,
    pub overlays: Vec<OverlaySpec>,
}

impl BoundaryRule {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let value: Value =
            serde_json::from_str(json).map_err(|err| ConfigError::Malformed(err.to_string()))?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let record = value.as_object().ok_or(ConfigError::NotAnObject)?;

        let resource = ResourcePattern::parse(required_str(record, "resource", "resource")?)?;

        let kind_name = required_str(record, "type", "type")?;
        let kind = BoundaryKind::parse(kind_name)
            .ok_or_else(|| ConfigError::invalid("type", kind_name))?;

        let selector = parse_selector(required(record, "selector", "selector")?)?;
        let action = parse_action(required(record, "action", "action")?)?;

        let description = match record.get("description") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text.clone(),
            Some(other) => return Err(ConfigError::invalid("description", other.to_string())),
        };

        let overlays = match record.get("overlays") {
            None | Some(Value::Null) => Vec::new(),
            Some(raw) => serde_json::from_value(raw.clone())
                .map_err(|err| ConfigError::invalid("overlays", err.to_string()))?,
        };

        Ok(Self {
            resource,
            kind,
            selector,
            action,
            description,
            overlays,
        })
    }

    pub fn is_observer(&self) -> bool {
        self.kind == BoundaryKind::MutationObserver
    }
}

/// A record that failed validation, with its position in the input list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedBoundary {
    pub position: usize,
    pub error: ConfigError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedBoundaries {
    pub rules: Vec<BoundaryRule>,
    pub rejected: Vec<RejectedBoundary>,
}

/// Parses a JSON array of boundary records.
///
/// A record that fails validation is skipped and reported in `rejected`; the
/// remaining rules keep their relative order.
pub fn parse_boundaries(json: &str) -> Result<LoadedBoundaries, ConfigError> {
    let value: Value =
        serde_json::from_str(json).map_err(|err| ConfigError::Malformed(err.to_string()))?;
    let records = value
        .as_array()
        .ok_or_else(|| ConfigError::Malformed("expected a list of boundary records".into()))?;

    let mut loaded = LoadedBoundaries::default();
    for (position, record) in records.iter().enumerate() {
        match BoundaryRule::from_value(record) {
            Ok(rule) => loaded.rules.push(rule),
            Err(error) => loaded.rejected.push(RejectedBoundary { position, error }),
        }
    }
    Ok(loaded)
}

fn required<'a>(
    record: &'a Map<String, Value>,
    key: &str,
    field: &'static str,
) -> Result<&'a Value, ConfigError> {
    match record.get(key) {
        None | Some(Value::Null) => Err(ConfigError::MissingField(field)),
        Some(value) => Ok(value),
    }
}

fn required_str<'a>(
    record: &'a Map<String, Value>,
    key: &str,
    field: &'static str,
) -> Result<&'a str, ConfigError> {
    let value = required(record, key, field)?;
    value
        .as_str()
        .ok_or_else(|| ConfigError::invalid(field, value.to_string()))
}

fn parse_selector(value: &Value) -> Result<SelectorSpec, ConfigError> {
    let selector = value
        .as_object()
        .ok_or_else(|| ConfigError::invalid("selector", value.to_string()))?;

    let type_name = required_str(selector, "type", "selector.type")?;
    let strategy = match type_name {
        "css-selector" => {
            let query = required_str(selector, "query", "selector.query")?.trim();
            if query.is_empty() {
                return Err(ConfigError::MissingField("selector.query"));
            }
            SelectorStrategy::CssSelector(query.to_string())
        }
        "link-query" => SelectorStrategy::LinkQuery,
        "link-query-lazy" => SelectorStrategy::LinkQueryLazy,
        other => return Err(ConfigError::invalid("selector.type", other)),
    };

    let mut options = match selector.get("options") {
        None | Some(Value::Null) => SelectorOptions::default(),
        Some(raw) => serde_json::from_value(raw.clone())
            .map_err(|err| ConfigError::invalid("selector.options", err.to_string()))?,
    };
    // Older configurations put the flags next to the selector type.
    if selector.get("lazy-loading").and_then(Value::as_bool) == Some(true) {
        options.lazy_loading = true;
    }
    if selector.get("worker").and_then(Value::as_bool) == Some(true) {
        options.worker = true;
    }

    Ok(SelectorSpec { strategy, options })
}

fn parse_action(value: &Value) -> Result<ActionSpec, ConfigError> {
    let action = value
        .as_object()
        .ok_or_else(|| ConfigError::invalid("action", value.to_string()))?;

    let type_name = required_str(action, "type", "action.type")?;
    let kind =
        ActionKind::parse(type_name).ok_or_else(|| ConfigError::invalid("action.type", type_name))?;

    let style = match action.get("style") {
        None | Some(Value::Null) => None,
        Some(raw) => Some(parse_style(raw)?),
    };
    let style = match (kind, style) {
        (ActionKind::Style, None) => return Err(ConfigError::MissingField("action.style")),
        (_, style) => style.unwrap_or_default(),
    };

    Ok(ActionSpec { kind, style })
}

fn parse_style(value: &Value) -> Result<StyleMap, ConfigError> {
    let raw: BTreeMap<String, Value> = serde_json::from_value(value.clone())
        .map_err(|err| ConfigError::invalid("action.style", err.to_string()))?;
    Ok(style_map_from(raw))
}
