//! Capability contracts for the host platform.
//!
//! The tracking engine never touches browser globals; the host hands it a
//! clock, key/value stores, a cookie jar and a transport, and forwards
//! page lifecycle events as plain values. Everything here is single
//! threaded by contract: one event is delivered at a time.

mod clock;
mod events;
mod store;
mod transport;

pub mod memory;

pub use clock::{Clock, SystemClock};
pub use events::{PageEvent, PageInfo, StorageChange, Visibility};
pub use store::{CookieStore, KeyValueStore};
pub use transport::{CancelToken, Transport, TransportError, TransportRequest};
