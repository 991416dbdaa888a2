//! Timestamp-derived identity generation.
//!
//! Ids are epoch milliseconds, bumped past the last issued value when the clock
//! has not advanced, so they stay unique and increasing within a process.

use chrono::Utc;
use parking_lot::Mutex;

/// Monotonic millisecond id generator
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: Mutex<u64>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure future ids sort after an id already in use.
    /// Non-numeric ids are ignored.
    pub fn observe(&self, id: &str) {
        if let Ok(value) = id.trim().parse::<u64>() {
            let mut last = self.last.lock();
            if value > *last {
                *last = value;
            }
        }
    }

    /// Next value: now in epoch millis, or last + 1 if that is not greater.
    pub fn next_value(&self) -> u64 {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        let mut last = self.last.lock();
        let next = if now > *last { now } else { *last + 1 };
        *last = next;
        next
    }

    /// Next value rendered as a decimal string
    pub fn next_id(&self) -> String {
        self.next_value().to_string()
    }
}
