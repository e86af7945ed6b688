use boundary_engine::{dedup_hrefs, Document, Rect, SearchRoot, SelectorError};
use pretty_assertions::assert_eq;

const PAGE: &str = r#"<html><body>
<div id="outer" style="left: 10px; top: 20px; width: 100px; height: 50px">
  <a id="rel" href="/docs/intro">Intro</a>
  <a id="abs" href="https://other.test/x">Other</a>
  <span id="plain">no link</span>
</div>
<link id="css" href="style.css">
</body></html>"#;

fn page() -> Document {
    Document::parse("http://site.test/base/index.html", PAGE)
}

#[test]
fn select_finds_elements_in_document_order() {
    let doc = page();
    let found = doc.select("a").expect("valid selector");
    assert_eq!(
        found,
        vec![
            doc.element_by_id("rel").unwrap(),
            doc.element_by_id("abs").unwrap()
        ]
    );
}

#[test]
fn invalid_selector_is_an_error() {
    let doc = page();
    let err = doc.select("div[").unwrap_err();
    assert!(matches!(err, SelectorError::InvalidSelector { ref query, .. } if query == "div["));
}

#[test]
fn href_nodes_resolve_against_the_page_url() {
    let doc = page();
    let hrefs: Vec<String> = doc
        .href_nodes(SearchRoot::descendants_of(doc.body()))
        .into_iter()
        .map(|(_, href)| href)
        .collect();
    assert_eq!(
        hrefs,
        vec![
            "http://site.test/docs/intro",
            "https://other.test/x",
            "http://site.test/base/style.css",
        ]
    );
}

#[test]
fn subtree_root_includes_the_node_itself() {
    let doc = page();
    let link = doc.element_by_id("abs").unwrap();
    assert!(doc.href_nodes(SearchRoot::descendants_of(link)).is_empty());
    assert_eq!(doc.href_nodes(SearchRoot::subtree(link)).len(), 1);
}

#[test]
fn inline_style_drives_geometry_until_layout_is_pinned() {
    let mut doc = page();
    let outer = doc.element_by_id("outer").unwrap();
    assert_eq!(doc.style(outer, "width").as_deref(), Some("100px"));
    assert_eq!(doc.bounding_rect(outer), Rect::new(10.0, 20.0, 100.0, 50.0));

    doc.set_style(outer, "width", "30px");
    assert_eq!(doc.style(outer, "width").as_deref(), Some("30px"));

    doc.set_layout(outer, Rect::new(0.0, 2000.0, 10.0, 10.0));
    assert_eq!(doc.bounding_rect(outer).y, 2000.0);
}

#[test]
fn intersection_follows_scrolling_and_margin() {
    let mut doc = page();
    let outer = doc.element_by_id("outer").unwrap();
    doc.set_layout(outer, Rect::new(0.0, 1000.0, 100.0, 100.0));

    assert_eq!(doc.intersection_ratio(outer, 0.0), 0.0);
    // Viewport ends at 800; a 250px margin reaches 1050.
    assert_eq!(doc.intersection_ratio(outer, 250.0), 0.5);

    doc.scroll_to(0.0, 900.0);
    assert_eq!(doc.intersection_ratio(outer, 0.0), 1.0);
}

#[test]
fn rect_intersection_edges() {
    let root = Rect::new(0.0, 0.0, 100.0, 100.0);
    assert_eq!(Rect::new(50.0, 50.0, 0.0, 0.0).intersection_ratio(&root), 1.0);
    assert_eq!(Rect::new(200.0, 0.0, 10.0, 10.0).intersection_ratio(&root), 0.0);
    assert_eq!(Rect::new(90.0, 0.0, 20.0, 10.0).intersection_ratio(&root), 0.5);
}

#[test]
fn appended_nodes_can_be_removed_with_their_subtree() {
    let mut doc = page();
    let body = doc.body();
    let added = doc.append_html(body, r#"<section id="late"><a href="/late">late</a></section>"#);
    assert_eq!(added.len(), 1);

    let section = doc.element_by_id("late").unwrap();
    assert_eq!(added[0], section);
    let subtree = doc.subtree(section);
    assert_eq!(subtree.len(), 3);
    assert!(doc.contains(body, subtree[1]));

    assert!(doc.remove(section));
    assert!(!doc.is_connected(section));
    assert!(subtree.iter().all(|node| !doc.is_connected(*node)));
    assert_eq!(doc.element_by_id("late"), None);
}

#[test]
fn body_cannot_be_removed() {
    let mut doc = page();
    let body = doc.body();
    assert!(!doc.remove(body));
    assert!(doc.is_connected(body));
}

#[test]
fn duplicate_hrefs_are_collapsed_in_first_seen_order() {
    let hrefs = ["http://b.test", "http://a.test", "http://b.test", "http://c.test"];
    assert_eq!(
        dedup_hrefs(hrefs),
        vec!["http://b.test", "http://a.test", "http://c.test"]
    );
}

#[test]
fn detached_overlay_slots_are_reused_and_old_handles_go_stale() {
    let mut doc = page();
    let host = doc.element_by_id("outer").unwrap();

    let first = doc.attach_overlay(host, "overlay", None, Default::default());
    doc.detach_overlay(first);
    assert!(doc.overlay(first).is_none());

    let second = doc.attach_overlay(host, "overlay", Some("again".into()), Default::default());
    assert_eq!(doc.overlay_capacity(), 1);
    assert!(doc.overlay(first).is_none());
    assert_eq!(
        doc.overlay(second).and_then(|o| o.description.as_deref()),
        Some("again")
    );

    // A stale handle must not touch the slot's new occupant.
    doc.detach_overlay(first);
    doc.set_overlay_style(first, "opacity", "0");
    assert_eq!(doc.overlays().count(), 1);
    assert_eq!(doc.overlay(second).and_then(|o| o.style("opacity")), None);
}
