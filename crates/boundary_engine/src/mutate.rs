use boundary_core::{OverlayKind, OverlaySpec, StyleMap};
use ego_tree::NodeId;

use crate::dom::{Document, OverlayHandle};

/// Writes every property of `styles` onto each node.
pub fn apply_styles_to_nodes(doc: &mut Document, nodes: &[NodeId], styles: &StyleMap) {
    for node in nodes {
        for (property, value) in styles {
            doc.set_style(*node, property, value);
        }
    }
}

/// Draws one overlay over `host`, sized to the host's rendered box.
///
/// The host becomes `position: relative` so the overlay lines up with it.
/// Tooltips carry `description` as their hover text.
pub fn attach_overlay(
    doc: &mut Document,
    host: NodeId,
    spec: &OverlaySpec,
    description: &str,
) -> OverlayHandle {
    let rect = doc.bounding_rect(host);
    let mut styles = StyleMap::new();
    styles.insert("width".into(), format!("{}px", rect.width));
    styles.insert("height".into(), format!("{}px", rect.height));
    styles.insert("top".into(), format!("{}px", rect.y));
    styles.insert("left".into(), format!("{}px", rect.x));
    styles.extend(spec.styles.clone());
    styles.insert("opacity".into(), opacity(spec.is_visible()).into());

    let description = match spec.kind {
        OverlayKind::Tooltip if !description.is_empty() => Some(description.to_string()),
        _ => None,
    };
    let handle = doc.attach_overlay(host, spec.kind.class_name(), description, styles);
    doc.set_style(host, "position", "relative");
    handle
}

pub(crate) fn opacity(visible: bool) -> &'static str {
    if visible {
        "1"
    } else {
        "0"
    }
}
