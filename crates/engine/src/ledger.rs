use chrono::{DateTime, Utc};

/// Raw timing substrate for one timed subject: an ordered list of closed
/// intervals plus the anchor of the currently open one.
///
/// `closed` only grows by appending the elapsed time between the previous
/// anchor and a suspend; the anchor resets on every ACTIVE entry.
#[derive(Debug, Clone)]
pub struct IntervalLedger {
    anchor: DateTime<Utc>,
    closed_ms: Vec<u64>,
    active: bool,
}

impl IntervalLedger {
    /// Opens the ledger in the ACTIVE state with `now` as the anchor.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            anchor: now,
            closed_ms: Vec::new(),
            active: true,
        }
    }

    /// ACTIVE entry: resets the anchor. A no-op while already active.
    pub fn start(&mut self, now: DateTime<Utc>) {
        if self.active {
            return;
        }
        self.anchor = now;
        self.active = true;
    }

    /// ACTIVE exit: closes the open interval.
    pub fn suspend(&mut self, now: DateTime<Utc>) {
        if !self.active {
            return;
        }
        self.closed_ms.push(elapsed_ms(self.anchor, now));
        self.active = false;
    }

    /// Total accumulated ACTIVE milliseconds so far. Pure; callable
    /// arbitrarily often.
    pub fn snapshot_ms(&self, now: DateTime<Utc>) -> u64 {
        let closed: u64 = self.closed_ms.iter().sum();
        if self.active {
            closed.saturating_add(elapsed_ms(self.anchor, now))
        } else {
            closed
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn closed_intervals(&self) -> &[u64] {
        &self.closed_ms
    }
}

fn elapsed_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    (end - start).num_milliseconds().max(0) as u64
}
