//! Windowed counters.
//!
//! Pity counters and participation limits are the same machine: a
//! counter plus a rule deciding when it resets. The rule differs
//! (threshold reached vs. window elapsed); the counter does not.

use crate::store::EntityRecord;
use crate::types::EpochMillis;

/// Counter state persisted under `<prefix>.count` and
/// `<prefix>.windowStart`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowedCounter {
    pub used: i64,
    pub window_start: EpochMillis,
}

pub trait ResetRule {
    fn expired(&self, counter: &WindowedCounter) -> bool;
}

/// Pity-style reset: fires once the counter reaches a threshold.
/// A threshold of 0 never fires.
pub struct ThresholdReached {
    pub max: i64,
}

impl ResetRule for ThresholdReached {
    fn expired(&self, counter: &WindowedCounter) -> bool {
        self.max > 0 && counter.used >= self.max
    }
}

/// Rate-limit-style reset: fires when the window has fully elapsed.
/// A start of 0 marks a window that never opened and counts as
/// elapsed.
pub struct WindowElapsed {
    pub window_ms: i64,
    pub now_ms: EpochMillis,
}

impl ResetRule for WindowElapsed {
    fn expired(&self, counter: &WindowedCounter) -> bool {
        counter.window_start == 0 || self.now_ms - counter.window_start >= self.window_ms
    }
}

impl WindowedCounter {
    pub fn load(record: &EntityRecord, prefix: &str) -> Self {
        Self {
            used: record.get_int(&format!("{prefix}.count")),
            window_start: record.get_int(&format!("{prefix}.windowStart")),
        }
    }

    pub fn store(&self, record: &mut EntityRecord, prefix: &str) {
        record.set_int(&format!("{prefix}.count"), self.used);
        record.set_int(&format!("{prefix}.windowStart"), self.window_start);
    }

    /// Pity counters persist only the count; there is no window.
    pub fn load_scalar(record: &EntityRecord, key: &str) -> Self {
        Self { used: record.get_int(key), window_start: 0 }
    }

    pub fn store_scalar(&self, record: &mut EntityRecord, key: &str) {
        record.set_int(key, self.used);
    }

    /// Apply the reset rule. Returns true when a reset happened.
    pub fn reset_if_expired(&mut self, rule: &impl ResetRule, now: EpochMillis) -> bool {
        if rule.expired(self) {
            self.used = 0;
            self.window_start = now;
            true
        } else {
            false
        }
    }
}

/// Sliding-window admission over an entity record.
pub struct EntitlementWindowLimiter;

impl EntitlementWindowLimiter {
    /// Try to consume `units` from the window under `prefix`.
    ///
    /// A disabled rule (count or window <= 0) always admits without
    /// touching state. A rejected call mutates nothing either; the
    /// elapsed-window reset is only written on the admit path.
    /// Atomicity per entity comes from running inside a vault update.
    pub fn try_consume(
        record: &mut EntityRecord,
        prefix: &str,
        limit_count: i64,
        window_ms: i64,
        now: EpochMillis,
        units: i64,
    ) -> bool {
        if limit_count <= 0 || window_ms <= 0 {
            return true;
        }
        let mut counter = WindowedCounter::load(record, prefix);
        counter.reset_if_expired(&WindowElapsed { window_ms, now_ms: now }, now);
        if counter.used + units > limit_count {
            return false;
        }
        counter.used += units;
        counter.store(record, prefix);
        true
    }

    /// Milliseconds until the window admits again; 0 when it already
    /// does. Used for availability listings.
    pub fn refresh_in_ms(
        record: &EntityRecord,
        prefix: &str,
        limit_count: i64,
        window_ms: i64,
        now: EpochMillis,
    ) -> i64 {
        if limit_count <= 0 || window_ms <= 0 {
            return 0;
        }
        let counter = WindowedCounter::load(record, prefix);
        let elapsed = now - counter.window_start;
        if elapsed >= window_ms {
            return 0;
        }
        if counter.used < limit_count {
            return 0;
        }
        window_ms - elapsed
    }
}
