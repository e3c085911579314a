//! Recorder: turns a live editing session into a [`Stream`].
//!
//! Attach it to a [`crate::TextBuffer`] through the buffer's observer hook,
//! or feed it operations directly from any editor host.

use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;

use crate::{ChangeRecord, Operation, Stream};

/// Accumulates change records as a person types.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    initial_value: String,
    records: Vec<ChangeRecord>,
    suspended: bool,
}

impl Recorder {
    pub fn new(initial_value: impl Into<String>) -> Self {
        Self {
            initial_value: initial_value.into(),
            records: Vec::new(),
            suspended: false,
        }
    }

    /// Record `op` at `time`. Returns whether the record was kept.
    ///
    /// Caret moves (collapsed selections) are not recorded. A timestamp
    /// earlier than the last record's is raised to it so the stream stays
    /// ordered.
    pub fn record(&mut self, time: i64, op: Operation) -> bool {
        if self.suspended {
            return false;
        }
        if let Operation::Select { range } = &op {
            if range.is_collapsed() {
                return false;
            }
        }

        let time = match self.records.last() {
            Some(last) if time < last.time => {
                debug!("Clamping out-of-order record time {} to {}", time, last.time);
                last.time
            }
            _ => time,
        };
        self.records.push(ChangeRecord::new(time, op));
        true
    }

    /// Record `op` stamped with the wall clock.
    pub fn record_now(&mut self, op: Operation) -> bool {
        self.record(now_ms(), op)
    }

    /// Stop accepting records, e.g. while the same editor plays a stream.
    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    pub fn resume(&mut self) {
        self.suspended = false;
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Copy of the stream recorded so far.
    pub fn stream(&self) -> Stream {
        Stream::new(self.initial_value.clone(), self.records.clone())
    }

    pub fn finish(self) -> Stream {
        Stream::new(self.initial_value, self.records)
    }
}

/// Milliseconds since the UNIX epoch.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
