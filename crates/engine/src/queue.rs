use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use log::{debug, warn};
use timeonsite_core::{Record, day_bucket_key};
use timeonsite_platform::{
    CancelToken, Clock, KeyValueStore, Transport, TransportError, TransportRequest,
};

use crate::config::RequestConfig;
use crate::error::Result;

/// Durable-store key holding the ordered list of day-bucket keys.
pub const DATE_KEYS_INDEX: &str = "TimeOnSiteDateKeys";

/// The only acknowledgment body that dequeues a record.
pub const SUCCESS_ACK: &str = "success";

/// Pause between successive sends of the same bucket.
const DRAIN_DELAY: Duration = Duration::from_millis(500);

/// Why a drain pass stopped before the queue was empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainStop {
    /// Another drain pass is already running on this tracker.
    AlreadyDraining,
    /// The collector answered, but not with the success token.
    Rejected(String),
    Transport(TransportError),
}

/// Result of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub delivered: usize,
    pub repaired_buckets: usize,
    pub stop: Option<DrainStop>,
}

/// Durable, day-bucketed FIFO record queue with acknowledgment-gated
/// draining.
///
/// Records never leave the store until the collector acknowledges them,
/// so an aborted request leaves the head queued (at-least-once; a lost
/// acknowledgment after a durable server accept yields a duplicate on
/// the next drain).
pub struct DeliveryQueue {
    store: Rc<dyn KeyValueStore>,
    clock: Rc<dyn Clock>,
    transport: Rc<dyn Transport>,
    endpoint: RequestConfig,
    cancel: CancelToken,
    draining: Cell<bool>,
}

impl DeliveryQueue {
    pub fn new(
        store: Rc<dyn KeyValueStore>,
        clock: Rc<dyn Clock>,
        transport: Rc<dyn Transport>,
        endpoint: RequestConfig,
    ) -> Self {
        Self {
            store,
            clock,
            transport,
            endpoint,
            cancel: CancelToken::new(),
            draining: Cell::new(false),
        }
    }

    /// Token shared with the in-flight request; cancelled on page unload.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Appends `record` to the tail of today's bucket, registering the
    /// bucket in the index first when the day is new.
    pub fn append(&self, record: &Record) -> Result<()> {
        let day_key = day_bucket_key(self.clock.today());
        let mut keys = self.date_keys()?;
        if !keys.iter().any(|key| key == &day_key) {
            keys.push(day_key.clone());
            self.store.set(DATE_KEYS_INDEX, &serde_json::to_string(&keys)?);
        }
        let mut bucket = self.bucket(&day_key)?;
        bucket.push(record.clone());
        self.store.set(&day_key, &serde_json::to_string(&bucket)?);
        Ok(())
    }

    /// Ordered day-bucket keys, oldest first.
    pub fn date_keys(&self) -> Result<Vec<String>> {
        match self.store.get(DATE_KEYS_INDEX) {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Pending records of one bucket, FIFO order.
    pub fn bucket(&self, day_key: &str) -> Result<Vec<Record>> {
        match self.store.get(day_key) {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn pending_total(&self) -> Result<usize> {
        let mut total = 0;
        for key in self.date_keys()? {
            total += self.bucket(&key)?.len();
        }
        Ok(total)
    }

    /// Drains the oldest bucket head-first, one request at a time, and
    /// recurses into the next bucket once it empties. Stops on the first
    /// non-success response and leaves the store untouched for that
    /// record.
    ///
    /// Re-reads the bucket and the key index around every send, so
    /// records appended while a send is in flight are delivered in the
    /// same pass, in FIFO order, even when they registered a new day key.
    /// A second drain entered while one is running is a no-op.
    pub fn drain_oldest_bucket(&self) -> Result<DrainSummary> {
        if self.draining.get() {
            return Ok(DrainSummary {
                stop: Some(DrainStop::AlreadyDraining),
                ..DrainSummary::default()
            });
        }
        self.draining.set(true);
        let result = self.drain_inner();
        self.draining.set(false);
        result
    }

    fn drain_inner(&self) -> Result<DrainSummary> {
        let mut summary = DrainSummary::default();
        loop {
            let mut keys = self.date_keys()?;
            let Some(day_key) = keys.first().cloned() else {
                break;
            };
            let bucket = self.bucket(&day_key)?;
            let Some(head) = bucket.first() else {
                // Dangling index entry; repair and stop.
                warn!("empty day bucket {day_key} in index; repairing");
                self.store.remove(&day_key);
                keys.remove(0);
                self.write_date_keys(&keys)?;
                summary.repaired_buckets += 1;
                break;
            };

            let body = serde_json::to_string(head)?;
            let request = TransportRequest {
                url: &self.endpoint.url,
                headers: &self.endpoint.headers,
                body: &body,
            };
            match self.transport.post(&request, &self.cancel) {
                Ok(ack) if ack == SUCCESS_ACK => {
                    // Re-read: the send may have overlapped an append to
                    // this same bucket.
                    let mut fresh = self.bucket(&day_key)?;
                    if !fresh.is_empty() {
                        fresh.remove(0);
                    }
                    summary.delivered += 1;
                    if fresh.is_empty() {
                        self.store.remove(&day_key);
                        // Same overlap applies to the index: the send may
                        // have registered a new day key.
                        let mut keys = self.date_keys()?;
                        keys.retain(|key| key != &day_key);
                        self.write_date_keys(&keys)?;
                        debug!("day bucket {day_key} fully drained");
                    } else {
                        self.store.set(&day_key, &serde_json::to_string(&fresh)?);
                        self.clock.sleep(DRAIN_DELAY);
                    }
                }
                Ok(other) => {
                    debug!("collector rejected record: {other:?}");
                    summary.stop = Some(DrainStop::Rejected(other));
                    break;
                }
                Err(err) => {
                    debug!("delivery attempt failed: {err}");
                    summary.stop = Some(DrainStop::Transport(err));
                    break;
                }
            }
        }
        Ok(summary)
    }

    /// An emptied index is deleted outright rather than stored as `[]`.
    fn write_date_keys(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            self.store.remove(DATE_KEYS_INDEX);
        } else {
            self.store.set(DATE_KEYS_INDEX, &serde_json::to_string(keys)?);
        }
        Ok(())
    }
}
