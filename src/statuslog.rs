//! Bounded in-memory notice log.
//!
//! Every user-visible diagnostic in the crate flows through one of these:
//! link state changes, writer failures, scan progress, analysis errors. The
//! buffer holds a fixed number of entries and evicts the oldest, so a
//! long-running session cannot grow it without bound. A front-end may render
//! the snapshot; nothing here depends on one existing.

use crate::timeseries::now_ms;
use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const DEFAULT_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub at_ms: u64,
    pub text: String,
}

impl Notice {
    /// Local wall-clock rendering ("HH:MM:SS") for console-style output.
    pub fn clock_time(&self) -> String {
        DateTime::from_timestamp_millis(self.at_ms as i64)
            .map(|dt| dt.with_timezone(&Local).format("%H:%M:%S").to_string())
            .unwrap_or_default()
    }
}

/// Cheaply cloneable handle to the shared notice buffer.
#[derive(Clone)]
pub struct StatusLog {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    entries: VecDeque<Notice>,
    capacity: usize,
}

impl StatusLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: VecDeque::new(),
                capacity: capacity.max(1),
            })),
        }
    }

    pub fn info(&self, text: impl Into<String>) {
        let text = text.into();
        log::info!("{}", text);
        self.push(text);
    }

    pub fn error(&self, text: impl Into<String>) {
        let text = text.into();
        log::error!("{}", text);
        self.push(format!("ERROR: {}", text));
    }

    fn push(&self, text: String) {
        let mut inner = self.inner.lock().unwrap();
        if inner.entries.len() == inner.capacity {
            inner.entries.pop_front();
        }
        inner.entries.push_back(Notice {
            at_ms: now_ms(),
            text,
        });
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current entries, newest first.
    pub fn snapshot(&self) -> Vec<Notice> {
        self.inner.lock().unwrap().entries.iter().rev().cloned().collect()
    }
}

impl Default for StatusLog {
    fn default() -> Self {
        Self::new()
    }
}
