use std::panic::AssertUnwindSafe;
use std::time::Duration;

use boundary_logging::{boundary_error, boundary_trace, boundary_warn};
use futures_util::FutureExt;
use thiserror::Error;
use url::Url;

use crate::{ArchiveEndpoint, EngineSettings};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("invalid archive query url: {0}")]
    InvalidQueryUrl(String),
    #[error("archive request timed out")]
    Timeout,
    #[error("archive responded with http status {0}")]
    HttpStatus(u16),
    #[error("archive request failed: {0}")]
    Network(String),
}

/// Answers whether the archival index holds a resource.
#[async_trait::async_trait]
pub trait Classifier: Send + Sync {
    async fn lookup(&self, archive: &ArchiveEndpoint, href: &str) -> Result<bool, ClassifyError>;
}

/// Only `http` and `https` targets can ever be in the archive.
pub fn is_network_url(href: &str) -> bool {
    Url::parse(href)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Classifies `href`, treating every failure as "absent".
pub async fn classify(classifier: &dyn Classifier, archive: &ArchiveEndpoint, href: &str) -> bool {
    if !is_network_url(href) {
        boundary_trace!("Skipping archive lookup for non-network href {}", href);
        return false;
    }
    match classifier.lookup(archive, href).await {
        Ok(present) => present,
        Err(err) => {
            boundary_warn!("Archive lookup for {} failed, treating as absent: {}", href, err);
            false
        }
    }
}

/// [`classify`] bounded by `limit`, with panics answered as "absent".
pub(crate) async fn classify_guarded(
    classifier: &dyn Classifier,
    archive: &ArchiveEndpoint,
    href: &str,
    limit: Duration,
) -> bool {
    let lookup = AssertUnwindSafe(classify(classifier, archive, href)).catch_unwind();
    match tokio::time::timeout(limit, lookup).await {
        Ok(Ok(present)) => present,
        Ok(Err(_)) => {
            boundary_error!("Classifier panicked while looking up {}", href);
            false
        }
        Err(_) => {
            boundary_warn!("Archive lookup for {} exceeded {:?}", href, limit);
            false
        }
    }
}

/// Queries a CDX-style index over HTTP.
///
/// A resource is present when the index answers with a non-empty body.
#[derive(Debug, Clone)]
pub struct CdxClassifier {
    client: reqwest::Client,
}

impl CdxClassifier {
    pub fn new(settings: &EngineSettings) -> Result<Self, ClassifyError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ClassifyError::Network(err.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Classifier for CdxClassifier {
    async fn lookup(&self, archive: &ArchiveEndpoint, href: &str) -> Result<bool, ClassifyError> {
        let url = archive
            .query_url(href)
            .map_err(|err| ClassifyError::InvalidQueryUrl(err.to_string()))?;

        let response = self.client.get(url).send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClassifyError::HttpStatus(status.as_u16()));
        }

        let body = response.text().await.map_err(map_reqwest_error)?;
        Ok(!body.is_empty())
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ClassifyError {
    if err.is_timeout() {
        return ClassifyError::Timeout;
    }
    ClassifyError::Network(err.to_string())
}
