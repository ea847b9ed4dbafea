use std::rc::Rc;

use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, warn};
use rand::Rng;
use timeonsite_core::{ActivityRecord, CustomData, PageRecord, Record, TrackedBy, TrackingType};
use timeonsite_platform::{
    Clock, CookieStore, KeyValueStore, PageEvent, PageInfo, StorageChange, Transport, Visibility,
};

use crate::accumulator::{Accumulator, ActivityTimer};
use crate::broadcast::SessionBroadcast;
use crate::config::{RecordCallback, TrackerConfig, is_url_well_formed};
use crate::queue::{DeliveryQueue, DrainSummary};
use crate::session::{SessionReconciler, SessionState};

/// Capabilities the host lends to the tracker. Optional stores reflect
/// platforms without them; the dependent features degrade with a
/// warning instead of failing.
#[derive(Clone)]
pub struct Platform {
    pub clock: Rc<dyn Clock>,
    /// Volatile tab-scoped store, cleared when the tab closes.
    pub volatile: Option<Rc<dyn KeyValueStore>>,
    /// Durable origin-scoped store shared across tabs.
    pub durable: Option<Rc<dyn KeyValueStore>>,
    pub cookies: Rc<dyn CookieStore>,
    pub transport: Rc<dyn Transport>,
}

/// Explicit tracker context: one per page visit, owned by the host, no
/// ambient singletons.
pub struct TimeOnSiteTracker {
    clock: Rc<dyn Clock>,
    track_by: TrackedBy,
    callback: Option<RecordCallback>,
    blacklist: Vec<String>,
    page: PageInfo,
    tos_allowed: bool,
    visibility: Visibility,
    custom: CustomData,
    page_acc: Accumulator,
    activity: Option<ActivityTimer>,
    state: SessionState,
    reconciler: SessionReconciler,
    broadcast: SessionBroadcast,
    queue: Option<DeliveryQueue>,
}

impl TimeOnSiteTracker {
    /// Builds the tracker, asks other tabs for a session snapshot,
    /// drains any records left over from earlier page loads, then
    /// reconciles the session for this page.
    pub fn new(config: TrackerConfig, platform: Platform, page: PageInfo) -> Self {
        let TrackerConfig {
            track_by,
            callback,
            request,
            blacklist_url,
        } = config;
        let Platform {
            clock,
            volatile,
            durable,
            cookies,
            transport,
        } = platform;

        if let Some(request) = &request {
            if !is_url_well_formed(&request.url) {
                warn!("given URL is not in a valid format: {:?}", request.url);
            }
        }
        if callback.is_some() && request.is_some() {
            warn!("both callback and collector endpoint given; give either one");
        }
        let queue = match (&callback, request) {
            (None, Some(endpoint)) => match &durable {
                Some(store) => Some(DeliveryQueue::new(
                    store.clone(),
                    clock.clone(),
                    transport.clone(),
                    endpoint,
                )),
                None => {
                    warn!("durable store unavailable; delivery queueing disabled");
                    None
                }
            },
            (None, None) => {
                warn!("records will not be observable: neither callback nor collector endpoint given");
                None
            }
            (Some(_), _) => None,
        };
        if volatile.is_none() {
            warn!("volatile store unavailable; session persistence disabled");
        }

        let now = clock.now();
        let reconciler =
            SessionReconciler::new(clock.clone(), volatile.clone(), durable.clone(), cookies);
        let broadcast = SessionBroadcast::new(volatile, durable);
        broadcast.request_snapshot();

        let mut tracker = Self {
            track_by,
            callback,
            blacklist: blacklist_url,
            tos_allowed: true,
            visibility: Visibility::Visible,
            custom: CustomData::new(),
            page_acc: Accumulator::new(now),
            activity: None,
            state: SessionState::anonymous(reconciler.new_session_key()),
            reconciler,
            broadcast,
            queue,
            clock,
            page,
        };
        tracker.tos_allowed = tracker.is_page_allowed();
        debug!("time at page entry: {}", rfc3339(now));
        tracker.drain_pending();
        tracker.reconcile();
        tracker
    }

    /// Non-mutating snapshot of time on the current page so far.
    pub fn get_time_on_page(&self) -> Record {
        Record::Page(self.build_page_record(None))
    }

    pub fn session_key(&self) -> &str {
        &self.state.session_key
    }

    pub fn session_state(&self) -> &SessionState {
        &self.state
    }

    pub fn queue(&self) -> Option<&DeliveryQueue> {
        self.queue.as_ref()
    }

    /// Entry point for every host-delivered lifecycle event.
    pub fn handle_event(&mut self, event: PageEvent) {
        match event {
            PageEvent::VisibilityChanged(visibility) => self.on_visibility_changed(visibility),
            PageEvent::UrlChanged(page) => self.on_url_changed(page),
            PageEvent::BeforeUnload => self.on_before_unload(),
            PageEvent::StorageChanged(change) => self.on_storage_changed(&change),
        }
    }

    pub fn on_visibility_changed(&mut self, visibility: Visibility) {
        if visibility == self.visibility {
            return;
        }
        self.visibility = visibility;
        let now = self.clock.now();
        match visibility {
            Visibility::Visible => {
                self.page_acc.on_visible(now);
                if let Some(activity) = &mut self.activity {
                    activity.on_visible(now);
                }
            }
            Visibility::Hidden => {
                self.page_acc.on_hidden(now);
                if let Some(activity) = &mut self.activity {
                    activity.on_hidden(now);
                }
            }
        }
    }

    /// Finalizes the departing page, then re-arms for the new URL and
    /// re-evaluates the blacklist against it.
    pub fn on_url_changed(&mut self, page: PageInfo) {
        self.reconcile();
        self.process_exit();
        self.page = page;
        self.tos_allowed = self.is_page_allowed();
    }

    /// Page teardown: reconcile, finalize, and abort any in-flight
    /// delivery. The un-acknowledged head record stays queued.
    pub fn on_before_unload(&mut self) {
        self.reconcile();
        self.process_exit();
        if let Some(queue) = &self.queue {
            queue.cancel_token().cancel();
        }
    }

    pub fn on_storage_changed(&mut self, change: &StorageChange) {
        if self.broadcast.handle_storage_change(change) {
            debug!("adopted session snapshot from another tab");
        }
    }

    /// Starts timing an activity, discarding any un-finalized one.
    pub fn start_activity(&mut self, details: CustomData) {
        if self.activity.is_some() {
            warn!("discarding previous un-finalized activity");
        }
        let now = self.clock.now();
        debug!("activity started at: {}", rfc3339(now));
        self.activity = Some(ActivityTimer::new(now, details));
    }

    /// Finalizes the open activity. With `defer_delivery` the record is
    /// only returned; otherwise it is also delivered. Warns and returns
    /// `None` when no activity was started.
    pub fn end_activity(&mut self, details: CustomData, defer_delivery: bool) -> Option<Record> {
        let Some(activity) = self.activity.take() else {
            warn!("start an activity before finishing it");
            return None;
        };
        let now = self.clock.now();
        let time_taken = self.track_by.report_units(activity.snapshot_ms(now));
        let mut custom = self.custom.clone();
        custom.merge(activity.start_details());
        custom.merge(&details);
        let record = Record::Activity(ActivityRecord {
            id: self.new_record_id(now),
            session_key: self.state.session_key.clone(),
            user_id: self.state.user_id.clone(),
            url: self.page.url.clone(),
            title: self.page.title.clone(),
            activity_start: rfc3339(activity.started_at()),
            activity_end: rfc3339(now),
            time_taken,
            time_taken_tracked_by: self.track_by,
            time_taken_by_duration: self.track_by.display_duration(time_taken),
            real_time_tracking: None,
            tracking_type: TrackingType::Activity,
            custom,
        });
        if !defer_delivery {
            self.deliver(record.clone());
        }
        Some(record)
    }

    /// Annotations merged into every subsequent record.
    pub fn set_custom_data(&mut self, data: CustomData) {
        if data.is_empty() {
            warn!("custom data should not be empty");
            return;
        }
        self.custom = data;
    }

    pub fn unset_custom_data(&mut self) {
        self.custom = CustomData::new();
    }

    /// Promotes the current anonymous session to an authenticated one.
    pub fn start_session(&mut self, user_id: &str) {
        self.reconciler.start_session(user_id, &mut self.state);
    }

    /// Finalizes the current record through the normal exit path, clears
    /// all session fields, and opens a fresh anonymous session.
    pub fn end_session(&mut self) {
        self.reconcile();
        self.process_exit();
        self.reconciler.reset_session(&mut self.state);
    }

    /// Re-invokes the queue drain explicitly; also run on construction.
    pub fn drain_pending(&self) -> Option<DrainSummary> {
        let queue = self.queue.as_ref()?;
        match queue.drain_oldest_bucket() {
            Ok(summary) => {
                if summary.delivered > 0 {
                    debug!("delivered {} queued records", summary.delivered);
                }
                Some(summary)
            }
            Err(err) => {
                warn!("delivery queue drain failed: {err}");
                None
            }
        }
    }

    fn reconcile(&mut self) {
        let now = self.clock.now();
        let page_ms = self.page_acc.snapshot_ms(now);
        self.reconciler.monitor(page_ms, &mut self.state);
    }

    fn process_exit(&mut self) {
        let now = self.clock.now();
        debug!("time at page exit: {}", rfc3339(now));
        let record = Record::Page(self.build_page_record(Some(now)));
        self.deliver(record);
        self.page_acc.reset(now);
        self.activity = None;
    }

    fn deliver(&mut self, mut record: Record) {
        if !self.tos_allowed {
            debug!("delivery suppressed for blacklisted page {}", self.page.url);
            return;
        }
        if let Some(callback) = &mut self.callback {
            record.set_real_time_tracking();
            callback(record);
        } else if let Some(queue) = &self.queue {
            if let Err(err) = queue.append(&record) {
                warn!("could not queue record: {err}");
            }
        }
    }

    fn build_page_record(&self, exit_time: Option<DateTime<Utc>>) -> PageRecord {
        let now = self.clock.now();
        let time_on_page = self.track_by.report_units(self.page_acc.snapshot_ms(now));
        let time_on_site = self.track_by.report_units(self.state.site_ms);
        PageRecord {
            id: self.new_record_id(now),
            session_key: self.state.session_key.clone(),
            user_id: self.state.user_id.clone(),
            url: self.page.url.clone(),
            title: self.page.title.clone(),
            entry_time: rfc3339(self.page_acc.entry_time()),
            current_time: rfc3339(now),
            exit_time: exit_time.map(rfc3339),
            time_on_page,
            time_on_page_tracked_by: self.track_by,
            time_on_page_by_duration: self.track_by.display_duration(time_on_page),
            time_on_site,
            time_on_site_by_duration: self.track_by.display_duration(time_on_site),
            real_time_tracking: None,
            tracking_type: TrackingType::Tos,
            custom: self.custom.clone(),
        }
    }

    fn is_page_allowed(&self) -> bool {
        !self.blacklist.iter().any(|url| url == &self.page.url)
    }

    fn new_record_id(&self, now: DateTime<Utc>) -> u64 {
        let ms = now.timestamp_millis().max(0) as u64;
        let factor: f64 = rand::thread_rng().gen_range(0.0..1.0);
        (ms as f64 * factor) as u64
    }
}

fn rfc3339(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}
