//! In-memory capability implementations for tests and demos.
//!
//! `SimClock` only moves when told to, so timing assertions are exact;
//! `MemoryStore` keeps a write log so a test can replay cross-tab storage
//! notifications; `ScriptedTransport` plays back canned acknowledgments.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::clock::Clock;
use crate::events::StorageChange;
use crate::store::{CookieStore, KeyValueStore};
use crate::transport::{CancelToken, Transport, TransportError, TransportRequest};

/// Simulated clock; `sleep` advances it instead of blocking.
#[derive(Debug)]
pub struct SimClock {
    now: Cell<DateTime<Utc>>,
}

impl SimClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    /// Starts at an arbitrary fixed instant.
    pub fn default_epoch() -> Self {
        Self::new(
            Utc.with_ymd_and_hms(2026, 8, 25, 10, 0, 0)
                .single()
                .expect("fixed epoch is valid"),
        )
    }

    pub fn advance_ms(&self, ms: u64) {
        let next = self.now.get() + chrono::Duration::milliseconds(ms as i64);
        self.now.set(next);
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        self.now.set(instant);
    }
}

impl Clock for SimClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }

    fn today(&self) -> NaiveDate {
        self.now.get().date_naive()
    }

    fn sleep(&self, duration: Duration) {
        self.advance_ms(duration.as_millis() as u64);
    }
}

/// Key/value store backed by a map, with a log of every mutation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<BTreeMap<String, String>>,
    writes: RefCell<Vec<StorageChange>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains the mutation log; each entry is what a storage-change
    /// notification in another tab would carry.
    pub fn take_writes(&self) -> Vec<StorageChange> {
        self.writes.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        self.writes.borrow_mut().push(StorageChange {
            key: key.to_string(),
            new_value: Some(value.to_string()),
        });
    }

    fn remove(&self, key: &str) {
        self.entries.borrow_mut().remove(key);
        self.writes.borrow_mut().push(StorageChange {
            key: key.to_string(),
            new_value: None,
        });
    }
}

/// Cookie jar that honors expiry against an injected clock.
pub struct MemoryCookieJar {
    clock: Rc<dyn Clock>,
    cookies: RefCell<BTreeMap<String, (String, DateTime<Utc>)>>,
}

impl MemoryCookieJar {
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            clock,
            cookies: RefCell::new(BTreeMap::new()),
        }
    }
}

impl CookieStore for MemoryCookieJar {
    fn get(&self, name: &str) -> Option<String> {
        let now = self.clock.now();
        let mut cookies = self.cookies.borrow_mut();
        match cookies.get(name) {
            Some((value, expires)) if *expires > now => Some(value.clone()),
            Some(_) => {
                cookies.remove(name);
                None
            }
            None => None,
        }
    }

    fn set(&self, name: &str, value: &str, expires_days: i64) {
        let expires = self.clock.now() + chrono::Duration::days(expires_days);
        self.cookies
            .borrow_mut()
            .insert(name.to_string(), (value.to_string(), expires));
    }

    fn remove(&self, name: &str) {
        self.cookies.borrow_mut().remove(name);
    }
}

/// A request captured by [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRequest {
    pub url: String,
    pub body: String,
}

/// Transport that records requests and replays scripted acknowledgments.
pub struct ScriptedTransport {
    responses: RefCell<VecDeque<Result<String, TransportError>>>,
    fallback: Result<String, TransportError>,
    sent: RefCell<Vec<SentRequest>>,
}

impl ScriptedTransport {
    /// Every request gets the same acknowledgment body.
    pub fn always(body: &str) -> Self {
        Self {
            responses: RefCell::new(VecDeque::new()),
            fallback: Ok(body.to_string()),
            sent: RefCell::new(Vec::new()),
        }
    }

    /// Every request fails with a transport error.
    pub fn failing() -> Self {
        Self {
            responses: RefCell::new(VecDeque::new()),
            fallback: Err(TransportError::Status(500)),
            sent: RefCell::new(Vec::new()),
        }
    }

    /// Queues one response ahead of the fallback.
    pub fn push_response(&self, response: Result<String, TransportError>) {
        self.responses.borrow_mut().push_back(response);
    }

    pub fn sent(&self) -> Vec<SentRequest> {
        self.sent.borrow().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.borrow().len()
    }
}

impl Transport for ScriptedTransport {
    fn post(
        &self,
        request: &TransportRequest<'_>,
        cancel: &CancelToken,
    ) -> Result<String, TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        self.sent.borrow_mut().push(SentRequest {
            url: request.url.to_string(),
            body: request.body.to_string(),
        });
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}
