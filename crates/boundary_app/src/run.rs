use std::cell::{Cell, RefCell};
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use boundary_engine::{
    BoundaryList, BoundaryReport, CdxClassifier, Classifier, Document, EngineSettings,
};
use boundary_logging::{boundary_info, boundary_warn};
use serde::Serialize;
use url::Url;

use crate::cli::CliArgs;
use crate::settings::load_settings;

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub url: String,
    /// Every non-lazy boundary finished its first application.
    pub complete: bool,
    /// No classification was still in flight when the run ended.
    pub idle: bool,
    /// Boundary indices in the order they reported loaded.
    pub loaded: Vec<usize>,
    pub boundaries: Vec<BoundaryReport>,
    pub rejected: Vec<RejectedReport>,
    pub overlays: usize,
}

#[derive(Debug, Serialize)]
pub struct RejectedReport {
    pub position: usize,
    pub field: Option<&'static str>,
    pub error: String,
}

/// Runs one page through the boundary list and renders the JSON report.
pub fn run(args: &CliArgs) -> Result<String> {
    let settings = load_settings(args.settings.as_deref())?;
    let classifier: Arc<dyn Classifier> = Arc::new(CdxClassifier::new(&settings)?);
    let report = run_with_classifier(args, settings, classifier)?;
    serde_json::to_string_pretty(&report).context("failed to serialise report")
}

pub fn run_with_classifier(
    args: &CliArgs,
    settings: EngineSettings,
    classifier: Arc<dyn Classifier>,
) -> Result<RunReport> {
    let html = fs::read_to_string(&args.page)
        .with_context(|| format!("failed to read page {}", args.page.display()))?;
    let boundaries = fs::read_to_string(&args.boundaries)
        .with_context(|| format!("failed to read boundaries {}", args.boundaries.display()))?;

    let url = match &args.url {
        Some(url) => url.clone(),
        None => file_url(&args.page)?,
    };
    let mut doc = Document::parse(url.clone(), &html);
    let mut list = BoundaryList::from_json(&boundaries, settings, classifier)
        .with_context(|| format!("invalid boundary list {}", args.boundaries.display()))?;

    let loaded = Rc::new(RefCell::new(Vec::new()));
    let complete = Rc::new(Cell::new(false));
    {
        let loaded = loaded.clone();
        let complete = complete.clone();
        list.apply_boundaries(
            &mut doc,
            move |boundary| loaded.borrow_mut().push(boundary.idx()),
            move || complete.set(true),
        );
    }

    let mut idle = list.run_until_idle(&mut doc, args.timeout());
    if let Some(offset) = args.scroll {
        boundary_info!("Scrolling viewport to y={}", offset);
        doc.scroll_to(0.0, offset);
        idle = list.run_until_idle(&mut doc, args.timeout());
    }
    if !idle {
        boundary_warn!("Classification still running after {:?}", args.timeout());
    }

    let rejected = list
        .rejected()
        .iter()
        .map(|rejected| RejectedReport {
            position: rejected.position,
            field: rejected.error.field(),
            error: rejected.error.to_string(),
        })
        .collect();
    let loaded = loaded.borrow().clone();

    Ok(RunReport {
        url,
        complete: complete.get(),
        idle,
        loaded,
        boundaries: list.report(),
        rejected,
        overlays: doc.overlays().count(),
    })
}

fn file_url(page: &Path) -> Result<String> {
    let absolute = fs::canonicalize(page)
        .with_context(|| format!("failed to resolve page path {}", page.display()))?;
    let url = Url::from_file_path(&absolute)
        .map_err(|()| anyhow!("page path {} is not a valid file URL", absolute.display()))?;
    Ok(url.to_string())
}
