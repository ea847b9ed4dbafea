//! Time-on-site tracking engine.
//!
//! Measures how long a visitor keeps a page (or an explicit activity)
//! active, reconciles that measurement into a session that survives
//! reloads, new tabs and sign-in transitions, and queues finalized
//! records for at-least-once delivery to a collector endpoint.
//!
//! The engine owns no globals and binds to no platform objects: the host
//! supplies capabilities through [`Platform`] and forwards lifecycle
//! events as [`timeonsite_platform::PageEvent`] values.

mod accumulator;
mod broadcast;
mod config;
mod error;
mod ledger;
mod queue;
mod session;
mod tracker;

pub use accumulator::{Accumulator, ActivityTimer};
pub use broadcast::{BROADCAST_PAYLOAD_KEY, BROADCAST_REQUEST_KEY, SessionBroadcast};
pub use config::{RecordCallback, RequestConfig, TrackerConfig};
pub use error::{QueueError, Result};
pub use ledger::IntervalLedger;
pub use queue::{DATE_KEYS_INDEX, DeliveryQueue, DrainStop, DrainSummary, SUCCESS_ACK};
pub use session::{
    ANONYMOUS_USER, SESSION_DURATION_COOKIE, SESSION_DURATION_KEY, SESSION_KEY,
    SESSION_KEY_COOKIE, SessionReconciler, SessionState, USER_ID_COOKIE,
};
pub use tracker::{Platform, TimeOnSiteTracker};
