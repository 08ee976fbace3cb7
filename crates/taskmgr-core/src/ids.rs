use std::cell::Cell;
use std::rc::Rc;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

pub trait IdGenerator {
    fn next_id(&mut self) -> String;
}

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Millisecond timestamps, bumped by one whenever the wall clock has not
/// moved past the previous id.
#[derive(Debug, Default)]
pub struct TimestampIds {
    last: i64,
}

impl TimestampIds {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_after(&mut self, now_ms: i64) -> String {
        let next = if now_ms > self.last {
            now_ms
        } else {
            self.last.saturating_add(1)
        };
        self.last = next;
        next.to_string()
    }
}

impl IdGenerator for TimestampIds {
    fn next_id(&mut self) -> String {
        self.next_after(Utc::now().timestamp_millis())
    }
}

#[derive(Debug, Clone)]
pub struct SequentialIds {
    prefix: String,
    next: u64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&mut self) -> String {
        let id = format!("{}{}", self.prefix, self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.now.set(at);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}
