use std::rc::Rc;

use log::{debug, warn};
use rand::Rng;
use timeonsite_platform::{Clock, CookieStore, KeyValueStore};

/// Volatile (tab-scoped) store keys.
pub const SESSION_KEY: &str = "TOSSessionKey";
pub const SESSION_DURATION_KEY: &str = "TOSSessionDuration";

/// Cookie names for the persistent authenticated session.
pub const USER_ID_COOKIE: &str = "TOSUserId";
pub const SESSION_KEY_COOKIE: &str = "TOSSessionKey";
pub const SESSION_DURATION_COOKIE: &str = "TOSSessionDuration";

pub const ANONYMOUS_USER: &str = "anonymous";

/// Authenticated cookies live one day, refreshed on every reconciliation
/// write.
pub const COOKIE_EXPIRY_DAYS: i64 = 1;

/// The session identity and duration this tab currently considers
/// authoritative. Durations are milliseconds; report-unit conversion
/// happens only when a record is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub session_key: String,
    pub user_id: String,
    pub site_ms: u64,
}

impl SessionState {
    pub fn anonymous(session_key: String) -> Self {
        Self {
            session_key,
            user_id: ANONYMOUS_USER.to_string(),
            site_ms: 0,
        }
    }
}

/// Merges accumulated page time against the tab-local and persistent
/// session records.
pub struct SessionReconciler {
    clock: Rc<dyn Clock>,
    volatile: Option<Rc<dyn KeyValueStore>>,
    durable: Option<Rc<dyn KeyValueStore>>,
    cookies: Rc<dyn CookieStore>,
}

impl SessionReconciler {
    pub fn new(
        clock: Rc<dyn Clock>,
        volatile: Option<Rc<dyn KeyValueStore>>,
        durable: Option<Rc<dyn KeyValueStore>>,
        cookies: Rc<dyn CookieStore>,
    ) -> Self {
        Self {
            clock,
            volatile,
            durable,
            cookies,
        }
    }

    /// Computes the authoritative session duration and identity for this
    /// tab. `page_ms` is the page accumulator snapshot at the call site.
    ///
    /// First matching branch wins: tab-local session, then persistent
    /// authenticated cookie, then a brand-new anonymous session.
    pub fn monitor(&self, page_ms: u64, state: &mut SessionState) {
        let Some(volatile) = &self.volatile else {
            // Accumulation still works in memory for the life of the page.
            return;
        };

        let stored_duration = volatile
            .get(SESSION_DURATION_KEY)
            .and_then(|value| match value.parse::<u64>() {
                Ok(ms) => Some(ms),
                Err(_) => {
                    warn!("ignoring unparsable session duration {value:?}");
                    None
                }
            });
        let stored_key = volatile.get(SESSION_KEY);

        if let (Some(duration), Some(key)) = (stored_duration, stored_key) {
            // Tab-local session continues.
            let total = page_ms.saturating_add(duration);
            volatile.set(SESSION_DURATION_KEY, &total.to_string());
            state.session_key = key;
            state.site_ms = total;
            if let Some(user_id) = self.cookies.get(USER_ID_COOKIE) {
                // Keep the authenticated copy current across the origin.
                state.user_id = user_id;
                self.cookies.set(
                    SESSION_DURATION_COOKIE,
                    &total.to_string(),
                    COOKIE_EXPIRY_DAYS,
                );
            }
            debug!("session so far: {total}ms");
        } else if let Some(user_id) = self.cookies.get(USER_ID_COOKIE) {
            // Fresh tab for an already-authenticated identity: resume from
            // the persistent duration.
            let persisted = self
                .cookies
                .get(SESSION_DURATION_COOKIE)
                .and_then(|value| value.parse::<u64>().ok())
                .unwrap_or(0);
            let total = page_ms.saturating_add(persisted);
            volatile.set(SESSION_DURATION_KEY, &total.to_string());
            let key = match self.cookies.get(SESSION_KEY_COOKIE) {
                Some(key) => key,
                None => {
                    warn!("authenticated session cookie has no session key; generating one");
                    self.new_session_key()
                }
            };
            volatile.set(SESSION_KEY, &key);
            state.session_key = key;
            state.user_id = user_id;
            state.site_ms = total;
        } else {
            // Brand-new anonymous session.
            self.open_anonymous(volatile, state);
        }
    }

    /// Promotes the current anonymous identity to `user_id`. Requires the
    /// durable store; warns and leaves everything unchanged otherwise.
    pub fn start_session(&self, user_id: &str, state: &mut SessionState) {
        if user_id.is_empty() {
            warn!("give a proper user id to start a session");
            return;
        }
        if self.durable.is_none() {
            warn!("could not start user session: durable store unavailable");
            return;
        }
        state.user_id = user_id.to_string();
        self.cookies.set(USER_ID_COOKIE, user_id, COOKIE_EXPIRY_DAYS);
        self.cookies
            .set(SESSION_KEY_COOKIE, &state.session_key, COOKIE_EXPIRY_DAYS);
        self.cookies
            .set(SESSION_DURATION_COOKIE, "0", COOKIE_EXPIRY_DAYS);
    }

    /// Clears every persistent and tab-local session field, then opens a
    /// brand-new anonymous session.
    pub fn reset_session(&self, state: &mut SessionState) {
        self.cookies.remove(USER_ID_COOKIE);
        self.cookies.remove(SESSION_KEY_COOKIE);
        self.cookies.remove(SESSION_DURATION_COOKIE);
        state.user_id = ANONYMOUS_USER.to_string();
        if let Some(volatile) = &self.volatile {
            self.open_anonymous(volatile, state);
        } else {
            state.session_key = self.new_session_key();
            state.site_ms = 0;
        }
    }

    fn open_anonymous(&self, volatile: &Rc<dyn KeyValueStore>, state: &mut SessionState) {
        volatile.set(SESSION_DURATION_KEY, "0");
        let key = self.new_session_key();
        volatile.set(SESSION_KEY, &key);
        state.session_key = key;
        state.user_id = ANONYMOUS_USER.to_string();
        state.site_ms = 0;
    }

    /// Opaque session key: timestamp fragment, sub-millisecond component
    /// and a random suffix. Collisions are negligible for this purpose;
    /// the key is not cryptographic.
    pub fn new_session_key(&self) -> String {
        let now = self.clock.now();
        let ms = now.timestamp_millis().max(0) as u64;
        let suffix: u32 = rand::thread_rng().gen_range(1..=10_000);
        format!("{}{}{}", ms + 1, now.timestamp_subsec_millis(), suffix)
    }
}
