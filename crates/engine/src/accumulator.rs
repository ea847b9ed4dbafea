use chrono::{DateTime, Utc};
use timeonsite_core::CustomData;

use crate::ledger::IntervalLedger;

/// Elapsed-ACTIVE-time tracker for one page visit.
#[derive(Debug, Clone)]
pub struct Accumulator {
    ledger: IntervalLedger,
    entry_time: DateTime<Utc>,
}

impl Accumulator {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            ledger: IntervalLedger::new(now),
            entry_time: now,
        }
    }

    pub fn on_visible(&mut self, now: DateTime<Utc>) {
        self.ledger.start(now);
    }

    pub fn on_hidden(&mut self, now: DateTime<Utc>) {
        self.ledger.suspend(now);
    }

    pub fn snapshot_ms(&self, now: DateTime<Utc>) -> u64 {
        self.ledger.snapshot_ms(now)
    }

    pub fn entry_time(&self) -> DateTime<Utc> {
        self.entry_time
    }

    /// Fresh visit: new entry time, empty ledger, ACTIVE.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        *self = Self::new(now);
    }
}

/// Independent sub-timer for one in-progress activity. Created by
/// `start_activity`, consumed by `end_activity`; follows the same
/// visibility signal as the page while open.
#[derive(Debug, Clone)]
pub struct ActivityTimer {
    ledger: IntervalLedger,
    started_at: DateTime<Utc>,
    start_details: CustomData,
}

impl ActivityTimer {
    pub fn new(now: DateTime<Utc>, start_details: CustomData) -> Self {
        Self {
            ledger: IntervalLedger::new(now),
            started_at: now,
            start_details,
        }
    }

    pub fn on_visible(&mut self, now: DateTime<Utc>) {
        self.ledger.start(now);
    }

    pub fn on_hidden(&mut self, now: DateTime<Utc>) {
        self.ledger.suspend(now);
    }

    pub fn snapshot_ms(&self, now: DateTime<Utc>) -> u64 {
        self.ledger.snapshot_ms(now)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn start_details(&self) -> &CustomData {
        &self.start_details
    }
}
