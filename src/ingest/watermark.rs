//! Lower bound of the next fetch window

use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Monotonic timestamp stored as epoch milliseconds
///
/// Only moves forward: an update older than the current value is ignored.
#[derive(Debug)]
pub struct Watermark {
    millis: AtomicI64,
}

impl Watermark {
    pub fn new(initial: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(initial.timestamp_millis()),
        }
    }

    /// Start `lookback` before now
    pub fn with_lookback(lookback: Duration) -> Self {
        let lookback = chrono::Duration::from_std(lookback).unwrap_or(chrono::Duration::zero());
        Self::new(Utc::now() - lookback)
    }

    pub fn get(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::Acquire)).unwrap_or_default()
    }

    /// Move forward to `at`; returns the resulting watermark
    pub fn advance_to(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let at = at.timestamp_millis();
        let previous = self.millis.fetch_max(at, Ordering::AcqRel);
        DateTime::from_timestamp_millis(previous.max(at)).unwrap_or_default()
    }

    pub fn advance_to_now(&self) -> DateTime<Utc> {
        self.advance_to(Utc::now())
    }

    /// RFC 3339 with second precision, as the data API expects
    pub fn to_rfc3339(&self) -> String {
        self.get().to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}
