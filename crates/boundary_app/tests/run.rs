use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use boundary_app::cli::CliArgs;
use clap::Parser;
use boundary_app::run::run_with_classifier;
use boundary_engine::{ArchiveEndpoint, Classifier, ClassifyError, EngineSettings};
use pretty_assertions::assert_eq;

struct OfflineArchive {
    archived: HashSet<&'static str>,
}

#[async_trait::async_trait]
impl Classifier for OfflineArchive {
    async fn lookup(&self, _archive: &ArchiveEndpoint, href: &str) -> Result<bool, ClassifyError> {
        Ok(self.archived.contains(href))
    }
}

const PAGE: &str = r#"<html><body>
<div id="banner" style="width: 300px; height: 40px">banner</div>
<a href="http://kept.test/">kept</a>
<a href="http://gone.test/">gone</a>
<a href="http://late.test/" style="top: 3000px; width: 80px; height: 16px">late</a>
</body></html>"#;

const RULES: &str = r##"[
    {
        "resource": "site.test/page",
        "type": "on-load",
        "selector": { "type": "css-selector", "query": "#banner" },
        "action": { "type": "disable" },
        "description": "Banner is outside the archive.",
        "overlays": [{ "type": "tooltip", "display": "visible" }]
    },
    {
        "resource": "all",
        "type": "on-load",
        "selector": { "type": "link-query" },
        "action": { "type": "none" }
    },
    {
        "resource": "all",
        "type": "on-load",
        "selector": { "type": "link-query-lazy" },
        "action": { "type": "none" }
    },
    { "resource": "all", "type": "on-load" }
]"##;

fn write_inputs(dir: &Path) -> (String, String) {
    let page = dir.join("page.html");
    let rules = dir.join("rules.json");
    std::fs::write(&page, PAGE).expect("write page");
    std::fs::write(&rules, RULES).expect("write rules");
    (
        page.to_string_lossy().into_owned(),
        rules.to_string_lossy().into_owned(),
    )
}

fn parse_args<'a>(args: impl IntoIterator<Item = &'a str>) -> Result<CliArgs, clap::Error> {
    CliArgs::try_parse_from(std::iter::once("boundary_app").chain(args))
}

fn offline() -> Arc<dyn Classifier> {
    Arc::new(OfflineArchive {
        archived: HashSet::from(["http://kept.test/"]),
    })
}

#[test]
fn report_covers_every_boundary() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (page, rules) = write_inputs(dir.path());
    let args = parse_args([page.as_str(), rules.as_str(), "--url", "http://site.test/page"])
        .expect("valid args");

    let report = run_with_classifier(&args, EngineSettings::default(), offline()).expect("run");

    assert!(report.complete);
    assert!(report.idle);
    assert_eq!(report.boundaries.len(), 3);
    assert_eq!(report.boundaries[0].affected_nodes, 1);
    assert_eq!(report.boundaries[0].overlays, vec!["overlay-display-00"]);
    // Eager queries flag gone.test and late.test wherever they sit.
    assert_eq!(report.boundaries[1].affected_nodes, 2);
    // Unpositioned links count as in view; late.test is below the fold.
    assert_eq!(report.boundaries[2].affected_nodes, 1);
    assert_eq!(report.overlays, 1);

    let mut loaded = report.loaded.clone();
    loaded.sort();
    assert_eq!(loaded, vec![0, 1, 2]);

    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].position, 3);
    assert_eq!(report.rejected[0].field, Some("selector"));
}

#[test]
fn scrolling_classifies_lazy_links() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (page, rules) = write_inputs(dir.path());
    let args = parse_args([
        page.as_str(),
        rules.as_str(),
        "--url",
        "http://site.test/page",
        "--scroll",
        "2900",
    ])
    .expect("valid args");

    let report = run_with_classifier(&args, EngineSettings::default(), offline()).expect("run");
    assert!(report.idle);
    assert_eq!(report.boundaries[2].affected_nodes, 2);
}

#[test]
fn unmatched_page_url_skips_resource_specific_boundaries() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (page, rules) = write_inputs(dir.path());
    let args = parse_args([page.as_str(), rules.as_str(), "--timeout-ms", "5000"])
        .expect("valid args");
    assert_eq!(args.timeout(), Duration::from_secs(5));

    let report = run_with_classifier(&args, EngineSettings::default(), offline()).expect("run");
    assert!(report.url.starts_with("file://"));
    assert_eq!(report.boundaries[0].affected_nodes, 0);
    assert_eq!(report.overlays, 0);
    assert!(report.complete);
}

#[test]
fn missing_page_is_an_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (_, rules) = write_inputs(dir.path());
    let missing = dir.path().join("nope.html").to_string_lossy().into_owned();
    let args = parse_args([missing.as_str(), rules.as_str()])
        .expect("valid args");

    let err = run_with_classifier(&args, EngineSettings::default(), offline()).unwrap_err();
    assert!(format!("{err:#}").contains("failed to read page"));
}

#[test]
fn page_path_is_percent_encoded_in_the_file_url() {
    let dir = tempfile::tempdir().expect("temp dir");
    let nested = dir.path().join("saved pages #1");
    std::fs::create_dir(&nested).expect("create dir");
    let (page, rules) = write_inputs(&nested);
    let args = parse_args([page.as_str(), rules.as_str()]).expect("valid args");

    let report = run_with_classifier(&args, EngineSettings::default(), offline()).expect("run");
    assert!(report.url.starts_with("file:///"), "{}", report.url);
    assert!(report.url.contains("saved%20pages%20%231/page.html"), "{}", report.url);
    let back = url::Url::parse(&report.url)
        .expect("valid url")
        .to_file_path()
        .expect("file path");
    assert_eq!(back, std::fs::canonicalize(&page).expect("canonical path"));
}
