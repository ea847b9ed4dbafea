mod support;

use std::cell::RefCell;
use std::rc::Rc;

use support::{COLLECTOR_URL, Harness, sample_record};
use timeonsite::{DATE_KEYS_INDEX, DeliveryQueue, DrainStop, RequestConfig};
use timeonsite_core::Record;
use timeonsite_platform::memory::{ScriptedTransport, SimClock};
use timeonsite_platform::{
    CancelToken, KeyValueStore, Transport, TransportError, TransportRequest,
};

fn queue_for(harness: &Harness) -> DeliveryQueue {
    DeliveryQueue::new(
        harness.durable.clone(),
        harness.clock.clone(),
        harness.transport.clone(),
        RequestConfig::new(COLLECTOR_URL),
    )
}

fn sent_ids(harness: &Harness) -> Vec<u64> {
    harness
        .transport
        .sent()
        .iter()
        .map(|request| {
            let record: Record = serde_json::from_str(&request.body).expect("sent record");
            record.id()
        })
        .collect()
}

#[test]
fn appends_register_the_day_bucket_once() {
    let harness = Harness::new();
    let queue = queue_for(&harness);

    queue.append(&sample_record(1)).expect("append");
    queue.append(&sample_record(2)).expect("append");

    assert_eq!(queue.date_keys().expect("keys"), vec!["TOS_8_25_2026"]);
    let bucket = queue.bucket("TOS_8_25_2026").expect("bucket");
    assert_eq!(bucket.len(), 2);
    assert_eq!(bucket[0].id(), 1);
    assert_eq!(bucket[1].id(), 2);
}

#[test]
fn drains_a_bucket_in_fifo_order_and_unregisters_it() {
    let harness = Harness::new();
    let queue = queue_for(&harness);
    queue.append(&sample_record(1)).expect("append");
    queue.append(&sample_record(2)).expect("append");

    let summary = queue.drain_oldest_bucket().expect("drain");

    assert_eq!(summary.delivered, 2);
    assert_eq!(summary.stop, None);
    assert_eq!(sent_ids(&harness), vec![1, 2]);
    assert_eq!(queue.pending_total().expect("pending"), 0);
    assert_eq!(harness.durable.get(DATE_KEYS_INDEX), None);
    assert_eq!(harness.durable.get("TOS_8_25_2026"), None);
}

#[test]
fn drains_buckets_oldest_day_first() {
    let harness = Harness::new();
    let queue = queue_for(&harness);
    queue.append(&sample_record(1)).expect("append");
    harness.clock.advance_ms(24 * 60 * 60 * 1000);
    queue.append(&sample_record(2)).expect("append");
    assert_eq!(
        queue.date_keys().expect("keys"),
        vec!["TOS_8_25_2026", "TOS_8_26_2026"]
    );

    let summary = queue.drain_oldest_bucket().expect("drain");

    assert_eq!(summary.delivered, 2);
    assert_eq!(sent_ids(&harness), vec![1, 2]);
    assert_eq!(queue.pending_total().expect("pending"), 0);
}

#[test]
fn unacknowledged_head_stays_queued() {
    let harness = Harness::with_transport(ScriptedTransport::failing());
    let queue = queue_for(&harness);
    queue.append(&sample_record(1)).expect("append");
    queue.append(&sample_record(2)).expect("append");

    let summary = queue.drain_oldest_bucket().expect("drain");

    assert_eq!(summary.delivered, 0);
    assert_eq!(
        summary.stop,
        Some(DrainStop::Transport(TransportError::Status(500)))
    );
    assert_eq!(harness.transport.sent_count(), 1);
    assert_eq!(queue.pending_total().expect("pending"), 2);
    let bucket = queue.bucket("TOS_8_25_2026").expect("bucket");
    assert_eq!(bucket[0].id(), 1);
}

#[test]
fn non_success_acknowledgment_stops_the_pass() {
    let harness = Harness::new();
    harness.transport.push_response(Ok("busy".to_string()));
    let queue = queue_for(&harness);
    queue.append(&sample_record(1)).expect("append");

    let summary = queue.drain_oldest_bucket().expect("drain");

    assert_eq!(summary.delivered, 0);
    assert_eq!(summary.stop, Some(DrainStop::Rejected("busy".to_string())));
    assert_eq!(queue.pending_total().expect("pending"), 1);
}

#[test]
fn delivery_resumes_behind_a_partial_failure() {
    let harness = Harness::with_transport(ScriptedTransport::failing());
    harness.transport.push_response(Ok("success".to_string()));
    let queue = queue_for(&harness);
    queue.append(&sample_record(1)).expect("append");
    queue.append(&sample_record(2)).expect("append");

    let summary = queue.drain_oldest_bucket().expect("drain");
    assert_eq!(summary.delivered, 1);
    assert_eq!(queue.pending_total().expect("pending"), 1);
    let bucket = queue.bucket("TOS_8_25_2026").expect("bucket");
    assert_eq!(bucket[0].id(), 2);

    // Collector recovered; the next pass picks up where this one stopped.
    harness.transport.push_response(Ok("success".to_string()));
    let summary = queue.drain_oldest_bucket().expect("drain");
    assert_eq!(summary.delivered, 1);
    assert_eq!(queue.pending_total().expect("pending"), 0);
    assert_eq!(sent_ids(&harness), vec![1, 2, 2]);
}

#[test]
fn dangling_index_entry_is_repaired() {
    let harness = Harness::new();
    harness
        .durable
        .set(DATE_KEYS_INDEX, r#"["TOS_8_24_2026"]"#);
    let queue = queue_for(&harness);

    let summary = queue.drain_oldest_bucket().expect("drain");

    assert_eq!(summary.repaired_buckets, 1);
    assert_eq!(summary.delivered, 0);
    assert_eq!(harness.transport.sent_count(), 0);
    assert_eq!(queue.date_keys().expect("keys"), Vec::<String>::new());
}

#[test]
fn cancelled_token_aborts_without_dequeuing() {
    let harness = Harness::new();
    let queue = queue_for(&harness);
    queue.append(&sample_record(1)).expect("append");
    queue.cancel_token().cancel();

    let summary = queue.drain_oldest_bucket().expect("drain");

    assert_eq!(
        summary.stop,
        Some(DrainStop::Transport(TransportError::Cancelled))
    );
    assert_eq!(queue.pending_total().expect("pending"), 1);
}

/// Appends one extra record to the queue while the first send is in
/// flight, then answers like the inner transport.
struct AppendingTransport {
    inner: ScriptedTransport,
    queue: RefCell<Option<Rc<DeliveryQueue>>>,
    extra: RefCell<Option<Record>>,
}

impl Transport for AppendingTransport {
    fn post(
        &self,
        request: &TransportRequest<'_>,
        cancel: &CancelToken,
    ) -> Result<String, TransportError> {
        if let Some(record) = self.extra.borrow_mut().take() {
            let queue = self.queue.borrow().clone().expect("queue wired");
            queue.append(&record).expect("append during drain");
        }
        self.inner.post(request, cancel)
    }
}

/// Rolls the clock past midnight and appends one record while the first
/// send is in flight, so the append lands in a brand-new day bucket.
struct RolloverTransport {
    inner: ScriptedTransport,
    clock: Rc<SimClock>,
    queue: RefCell<Option<Rc<DeliveryQueue>>>,
    extra: RefCell<Option<Record>>,
}

impl Transport for RolloverTransport {
    fn post(
        &self,
        request: &TransportRequest<'_>,
        cancel: &CancelToken,
    ) -> Result<String, TransportError> {
        if let Some(record) = self.extra.borrow_mut().take() {
            self.clock.advance_ms(24 * 60 * 60 * 1000);
            let queue = self.queue.borrow().clone().expect("queue wired");
            queue.append(&record).expect("append during drain");
        }
        self.inner.post(request, cancel)
    }
}

#[test]
fn day_key_registered_during_a_drain_survives_the_index_write() {
    let harness = Harness::new();
    let transport = Rc::new(RolloverTransport {
        inner: ScriptedTransport::always("success"),
        clock: harness.clock.clone(),
        queue: RefCell::new(None),
        extra: RefCell::new(Some(sample_record(2))),
    });
    let queue = Rc::new(DeliveryQueue::new(
        harness.durable.clone(),
        harness.clock.clone(),
        transport.clone(),
        RequestConfig::new(COLLECTOR_URL),
    ));
    *transport.queue.borrow_mut() = Some(queue.clone());
    queue.append(&sample_record(1)).expect("append");

    let summary = queue.drain_oldest_bucket().expect("drain");

    // The new day's record was neither orphaned nor dropped.
    assert_eq!(summary.delivered, 2);
    assert_eq!(transport.inner.sent_count(), 2);
    assert_eq!(queue.pending_total().expect("pending"), 0);
    assert_eq!(queue.date_keys().expect("keys"), Vec::<String>::new());
    assert_eq!(harness.durable.get(DATE_KEYS_INDEX), None);
}

#[test]
fn record_appended_during_a_drain_is_delivered_in_the_same_pass() {
    let harness = Harness::new();
    let transport = Rc::new(AppendingTransport {
        inner: ScriptedTransport::always("success"),
        queue: RefCell::new(None),
        extra: RefCell::new(Some(sample_record(2))),
    });
    let queue = Rc::new(DeliveryQueue::new(
        harness.durable.clone(),
        harness.clock.clone(),
        transport.clone(),
        RequestConfig::new(COLLECTOR_URL),
    ));
    *transport.queue.borrow_mut() = Some(queue.clone());
    queue.append(&sample_record(1)).expect("append");

    let summary = queue.drain_oldest_bucket().expect("drain");

    assert_eq!(summary.delivered, 2);
    assert_eq!(transport.inner.sent_count(), 2);
    assert_eq!(queue.pending_total().expect("pending"), 0);
}
