use std::time::Duration;

use url::Url;

const DEFAULT_HOST: &str = "http://localhost:8080/";
const DEFAULT_ENDPOINT: &str = "cdx";
const DEFAULT_ROOT_MARGIN: f64 = 25.0;

/// The archival index service that classification queries go to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEndpoint {
    pub host: String,
    pub endpoint: String,
}

impl ArchiveEndpoint {
    pub fn new(host: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            endpoint: endpoint.into(),
        }
    }

    /// `<host><endpoint>?output=json&limit=1&url=<encoded href>`
    pub fn query_url(&self, href: &str) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&format!("{}{}", self.host, self.endpoint))?;
        url.query_pairs_mut()
            .append_pair("output", "json")
            .append_pair("limit", "1")
            .append_pair("url", href);
        Ok(url)
    }
}

impl Default for ArchiveEndpoint {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_ENDPOINT)
    }
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub archive: ArchiveEndpoint,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Upper bound for one classification, whatever the classifier does.
    pub classify_timeout: Duration,
    pub worker_pool_size: usize,
    /// Pixels added around the viewport before lazy links are classified.
    pub lazy_root_margin: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            archive: ArchiveEndpoint::default(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            classify_timeout: Duration::from_secs(45),
            worker_pool_size: default_pool_size(),
            lazy_root_margin: DEFAULT_ROOT_MARGIN,
        }
    }
}

/// One thread fewer than the machine offers, but at least one.
pub fn default_pool_size() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}
