use std::fmt;

use regex::Regex;

use crate::ConfigError;

/// Marker that turns a resource into a wildcard pattern.
pub const WILDCARD: char = '*';

const MATCH_ALL: &str = "all";

/// Decides whether a boundary applies to the current page URL.
///
/// Plain patterns are anchored to the end of the URL so that prefixes added
/// by archive replay (`/web/2020.../http://...`) do not prevent a match.
/// Wildcard patterns may match anywhere in the URL.
#[derive(Debug, Clone)]
pub enum ResourcePattern {
    All,
    Suffix(String),
    Wildcard { pattern: String, regex: Regex },
}

impl ResourcePattern {
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        if pattern == MATCH_ALL {
            return Ok(Self::All);
        }
        if pattern.trim().is_empty() {
            return Err(ConfigError::invalid("resource", "empty pattern"));
        }
        if !pattern.contains(WILDCARD) {
            return Ok(Self::Suffix(pattern.to_string()));
        }

        let source = pattern
            .split(WILDCARD)
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let regex =
            Regex::new(&source).map_err(|err| ConfigError::invalid("resource", err.to_string()))?;
        Ok(Self::Wildcard {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, url: &str) -> bool {
        match self {
            ResourcePattern::All => true,
            ResourcePattern::Suffix(suffix) => url.ends_with(suffix.as_str()),
            ResourcePattern::Wildcard { regex, .. } => regex.is_match(url),
        }
    }

    /// The pattern exactly as configured.
    pub fn as_str(&self) -> &str {
        match self {
            ResourcePattern::All => MATCH_ALL,
            ResourcePattern::Suffix(suffix) => suffix,
            ResourcePattern::Wildcard { pattern, .. } => pattern,
        }
    }
}

impl PartialEq for ResourcePattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl fmt::Display for ResourcePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
