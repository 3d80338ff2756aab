use std::time::{SystemTime, UNIX_EPOCH};

/// One persisted row: a wall-clock millisecond timestamp and an integer value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub time_ms: u64,
    pub value: i64,
}

pub trait PointSliceExt {
    fn min_max_value(&self) -> Option<(i64, i64)>;
    fn mean_value(&self) -> Option<i64>;
    fn min_time(&self) -> Option<u64>;
}

impl PointSliceExt for [Point] {
    fn min_max_value(&self) -> Option<(i64, i64)> {
        self.iter().fold(None, |acc, point| match acc {
            None => Some((point.value, point.value)),
            Some((min, max)) => Some((min.min(point.value), max.max(point.value))),
        })
    }

    /// Mean over the raw values, truncated to an integer. Truncation (not
    /// rounding) is the display convention for these statistics.
    fn mean_value(&self) -> Option<i64> {
        if self.is_empty() {
            return None;
        }
        let sum: i128 = self.iter().map(|p| p.value as i128).sum();
        Some((sum / self.len() as i128) as i64)
    }

    fn min_time(&self) -> Option<u64> {
        self.iter().fold(None, |acc, point| match acc {
            None => Some(point.time_ms),
            Some(min) => Some(min.min(point.time_ms)),
        })
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}
