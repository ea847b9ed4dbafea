/// Page visibility as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// URL and title of the page currently hosting the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    pub url: String,
    pub title: String,
}

impl PageInfo {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
        }
    }
}

/// A change observed on the shared durable store (another tab wrote it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub key: String,
    /// `None` when the key was removed.
    pub new_value: Option<String>,
}

/// Host-delivered lifecycle events; the only inputs that mutate tracker
/// state after construction.
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    VisibilityChanged(Visibility),
    UrlChanged(PageInfo),
    BeforeUnload,
    StorageChanged(StorageChange),
}
