use std::collections::BTreeMap;
use std::rc::Rc;

use log::{debug, warn};
use timeonsite_platform::{KeyValueStore, StorageChange};

use crate::session::{SESSION_DURATION_KEY, SESSION_KEY};

/// Transient durable-store key another tab writes (and immediately
/// removes) to ask for a session snapshot. The write exists only to fire
/// a storage-change notification.
pub const BROADCAST_REQUEST_KEY: &str = "getSessionStorage";

/// Transient durable-store key carrying a published session snapshot.
pub const BROADCAST_PAYLOAD_KEY: &str = "sessionStorage";

/// Only these fields are ever adopted from a published snapshot.
const ADOPTED_FIELDS: [&str; 2] = [SESSION_KEY, SESSION_DURATION_KEY];

/// Best-effort relay of the tab-local session record to newly-opened
/// tabs. Not a consensus mechanism: concurrent responders race and the
/// last write observed wins.
pub struct SessionBroadcast {
    volatile: Option<Rc<dyn KeyValueStore>>,
    durable: Option<Rc<dyn KeyValueStore>>,
}

impl SessionBroadcast {
    pub fn new(
        volatile: Option<Rc<dyn KeyValueStore>>,
        durable: Option<Rc<dyn KeyValueStore>>,
    ) -> Self {
        Self { volatile, durable }
    }

    /// Asks other tabs for their session snapshot when this tab has no
    /// tab-local session yet.
    pub fn request_snapshot(&self) {
        let (Some(volatile), Some(durable)) = (&self.volatile, &self.durable) else {
            return;
        };
        if volatile.get(SESSION_KEY).is_some() {
            return;
        }
        debug!("new tab session monitoring: requesting snapshot");
        durable.set(BROADCAST_REQUEST_KEY, "1");
        durable.remove(BROADCAST_REQUEST_KEY);
    }

    /// Reacts to a storage-change notification from another tab. Returns
    /// `true` when a published snapshot was adopted.
    pub fn handle_storage_change(&self, change: &StorageChange) -> bool {
        // Removal notifications carry no value to work with.
        let Some(new_value) = &change.new_value else {
            return false;
        };
        match change.key.as_str() {
            BROADCAST_REQUEST_KEY => {
                self.publish_snapshot();
                false
            }
            BROADCAST_PAYLOAD_KEY => self.adopt_snapshot(new_value),
            _ => false,
        }
    }

    /// Another tab asked for the session: publish this tab's volatile
    /// session fields, then drop the payload key.
    fn publish_snapshot(&self) {
        let (Some(volatile), Some(durable)) = (&self.volatile, &self.durable) else {
            return;
        };
        let mut snapshot = BTreeMap::new();
        for field in ADOPTED_FIELDS {
            if let Some(value) = volatile.get(field) {
                snapshot.insert(field, value);
            }
        }
        if snapshot.is_empty() {
            return;
        }
        match serde_json::to_string(&snapshot) {
            Ok(payload) => {
                durable.set(BROADCAST_PAYLOAD_KEY, &payload);
                durable.remove(BROADCAST_PAYLOAD_KEY);
            }
            Err(err) => warn!("could not publish session snapshot: {err}"),
        }
    }

    /// Filters a published payload down to the whitelisted fields and
    /// adopts them into the volatile store.
    fn adopt_snapshot(&self, payload: &str) -> bool {
        let Some(volatile) = &self.volatile else {
            return false;
        };
        let parsed: BTreeMap<String, String> = match serde_json::from_str(payload) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("ignoring malformed session snapshot: {err}");
                return false;
            }
        };
        let mut adopted = false;
        for field in ADOPTED_FIELDS {
            if let Some(value) = parsed.get(field) {
                volatile.set(field, value);
                adopted = true;
            }
        }
        adopted
    }
}
