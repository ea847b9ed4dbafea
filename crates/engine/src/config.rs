use timeonsite_core::{Record, TrackedBy};

/// Host-supplied sink for finalized records. When present, records go
/// here instead of the delivery queue.
pub type RecordCallback = Box<dyn FnMut(Record)>;

/// Collector endpoint and extra request headers, used when no callback
/// is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestConfig {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl RequestConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }
}

/// Tracker configuration. Malformed values degrade with a warning, they
/// never fail construction.
pub struct TrackerConfig {
    /// Unit of all reported durations.
    pub track_by: TrackedBy,
    pub callback: Option<RecordCallback>,
    pub request: Option<RequestConfig>,
    /// Exact-match URLs excluded from delivery; accumulation still runs.
    pub blacklist_url: Vec<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            track_by: TrackedBy::Millisecond,
            callback: None,
            request: None,
            blacklist_url: Vec::new(),
        }
    }
}

impl std::fmt::Debug for TrackerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerConfig")
            .field("track_by", &self.track_by)
            .field("callback", &self.callback.is_some())
            .field("request", &self.request)
            .field("blacklist_url", &self.blacklist_url)
            .finish()
    }
}

/// Light shape check for the collector URL; failures only warn.
pub(crate) fn is_url_well_formed(url: &str) -> bool {
    match url.split_once("://") {
        Some((scheme, rest)) => {
            matches!(scheme, "http" | "https" | "ftp") && !rest.is_empty()
        }
        None => false,
    }
}
