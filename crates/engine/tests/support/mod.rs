#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use timeonsite::{Platform, RecordCallback, RequestConfig, TimeOnSiteTracker, TrackerConfig};
use timeonsite_core::{CustomData, PageRecord, Record, TrackedBy, TrackingType};
use timeonsite_platform::PageInfo;
use timeonsite_platform::memory::{MemoryCookieJar, MemoryStore, ScriptedTransport, SimClock};

pub const COLLECTOR_URL: &str = "http://localhost:4500/data/tos";

/// One simulated tab plus the origin-wide stores it shares.
pub struct Harness {
    pub clock: Rc<SimClock>,
    pub volatile: Rc<MemoryStore>,
    pub durable: Rc<MemoryStore>,
    pub cookies: Rc<MemoryCookieJar>,
    pub transport: Rc<ScriptedTransport>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_transport(ScriptedTransport::always("success"))
    }

    pub fn with_transport(transport: ScriptedTransport) -> Self {
        let clock = Rc::new(SimClock::default_epoch());
        let cookies = Rc::new(MemoryCookieJar::new(clock.clone()));
        Self {
            volatile: Rc::new(MemoryStore::new()),
            durable: Rc::new(MemoryStore::new()),
            transport: Rc::new(transport),
            clock,
            cookies,
        }
    }

    pub fn platform(&self) -> Platform {
        Platform {
            clock: self.clock.clone(),
            volatile: Some(self.volatile.clone()),
            durable: Some(self.durable.clone()),
            cookies: self.cookies.clone(),
            transport: self.transport.clone(),
        }
    }

    /// Same origin-wide state, fresh tab-scoped store.
    pub fn new_tab(&self) -> (Rc<MemoryStore>, Platform) {
        let volatile = Rc::new(MemoryStore::new());
        let mut platform = self.platform();
        platform.volatile = Some(volatile.clone());
        (volatile, platform)
    }

    pub fn queued_config(&self, track_by: TrackedBy) -> TrackerConfig {
        TrackerConfig {
            track_by,
            request: Some(RequestConfig::new(COLLECTOR_URL)),
            ..TrackerConfig::default()
        }
    }

    pub fn queued_tracker(&self, track_by: TrackedBy) -> TimeOnSiteTracker {
        TimeOnSiteTracker::new(self.queued_config(track_by), self.platform(), home_page())
    }
}

pub fn home_page() -> PageInfo {
    PageInfo::new("https://example.com/home", "Home")
}

pub fn player_page() -> PageInfo {
    PageInfo::new("https://example.com/player", "Player")
}

/// Callback sink capturing every record handed to it.
pub fn capturing_callback() -> (Rc<RefCell<Vec<Record>>>, RecordCallback) {
    let records = Rc::new(RefCell::new(Vec::new()));
    let sink = records.clone();
    (records, Box::new(move |record| sink.borrow_mut().push(record)))
}

pub fn sample_record(id: u64) -> Record {
    Record::Page(PageRecord {
        id,
        session_key: "14556000001231234".to_string(),
        user_id: "anonymous".to_string(),
        url: "https://example.com/home".to_string(),
        title: "Home".to_string(),
        entry_time: "2026-08-25T10:00:00.000Z".to_string(),
        current_time: "2026-08-25T10:00:05.000Z".to_string(),
        exit_time: Some("2026-08-25T10:00:05.000Z".to_string()),
        time_on_page: 5000,
        time_on_page_tracked_by: TrackedBy::Millisecond,
        time_on_page_by_duration: "0d 00h 00m 05s".to_string(),
        time_on_site: 5000,
        time_on_site_by_duration: "0d 00h 00m 05s".to_string(),
        real_time_tracking: None,
        tracking_type: TrackingType::Tos,
        custom: CustomData::new(),
    })
}
