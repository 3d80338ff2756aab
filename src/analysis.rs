//! # Recording Analysis Module
//!
//! Offline reconstruction of a completed recording: loads the persisted
//! channel files and the event log, rebases every timestamp onto a common
//! zero origin, and derives per-participant statistics plus event overlays.
//!
//! ## Key Types
//! - `Recording`: the raw rows and events read back from one recording
//!   directory, with per-file load errors collected rather than fatal
//! - `TimeNormalized`: the derived view a chart renderer consumes — series
//!   in elapsed seconds, min/max/mean per channel, point markers and shaded
//!   interval windows
//!
//! A missing channel file yields an empty series. A malformed row rejects
//! its whole file: the error is reported loudly and that series is absent,
//! never truncated to the rows before the bad one.

use crate::error::AnalysisError;
use crate::events::{EventKind, EventMark};
use crate::layout::{ChannelKind, RecordingLayout, Slot, EVENTS_HEADER};
use crate::statuslog::StatusLog;
use crate::timeseries::{Point, PointSliceExt};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::Path;
use std::str::FromStr;

/// Number of distinct interval shades before colors repeat.
pub const PALETTE_SIZE: usize = 6;

/// A recording read back from disk, independent of any live session.
pub struct Recording {
    events: Vec<EventMark>,
    channels: HashMap<(Slot, ChannelKind), Vec<Point>>,
    load_errors: Vec<AnalysisError>,
}

impl Recording {
    /// Loads every channel file and the event log under `dir`. File-level
    /// failures degrade that series to empty and are collected in
    /// [`Recording::load_errors`] as well as reported through `notices`.
    pub fn load(dir: &Path, notices: &StatusLog) -> Recording {
        let layout = RecordingLayout::from_dir(dir);
        let mut load_errors = Vec::new();

        let events = match load_events(&layout.events_file()) {
            Ok(events) => events,
            Err(e) => {
                notices.error(e.to_string());
                load_errors.push(e);
                Vec::new()
            }
        };

        let mut channels = HashMap::new();
        for slot in Slot::ALL {
            for channel in ChannelKind::ALL {
                let path = layout.channel_file(slot, channel);
                match load_channel(&path, channel) {
                    Ok(points) => {
                        channels.insert((slot, channel), points);
                    }
                    Err(e) => {
                        notices.error(e.to_string());
                        load_errors.push(e);
                        channels.insert((slot, channel), Vec::new());
                    }
                }
            }
        }

        Recording {
            events,
            channels,
            load_errors,
        }
    }

    pub fn events(&self) -> &[EventMark] {
        &self.events
    }

    pub fn channel(&self, slot: Slot, channel: ChannelKind) -> &[Point] {
        self.channels
            .get(&(slot, channel))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn load_errors(&self) -> &[AnalysisError] {
        &self.load_errors
    }
}

/// Descriptive statistics over one channel's raw values.
///
/// `mean` is truncated to an integer for display, not rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStats {
    pub min: i64,
    pub max: i64,
    pub mean: i64,
}

/// One closed interval on the normalized axis, shaded with a palette color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalWindow {
    pub start_s: f64,
    pub end_s: f64,
    pub color_index: usize,
}

/// Event overlays on the normalized axis.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Markers {
    /// Normalized times of manual marks.
    pub points: Vec<f64>,
    /// Closed interval windows in the order they closed.
    pub intervals: Vec<IntervalWindow>,
}

/// A recording rebased onto a zero origin, with derived statistics.
pub struct TimeNormalized {
    origin_ms: u64,
    series: HashMap<(Slot, ChannelKind), Vec<(f64, i64)>>,
    stats: HashMap<(Slot, ChannelKind), ChannelStats>,
    markers: Markers,
}

impl TimeNormalized {
    /// Builds the normalized view. The origin is the earliest timestamp over
    /// the union of all channel rows and events; with no rows anywhere the
    /// recording is empty and cannot be normalized.
    pub fn build(recording: &Recording) -> Result<TimeNormalized, AnalysisError> {
        let mut origin: Option<u64> = None;
        for points in recording.channels.values() {
            if let Some(min) = points.min_time() {
                origin = Some(origin.map_or(min, |o| o.min(min)));
            }
        }
        for event in &recording.events {
            origin = Some(origin.map_or(event.timestamp_ms, |o| o.min(event.timestamp_ms)));
        }
        let origin_ms = origin.ok_or(AnalysisError::EmptyRecording)?;

        let mut series = HashMap::new();
        let mut stats = HashMap::new();
        for (&key, points) in &recording.channels {
            if points.is_empty() {
                continue;
            }
            series.insert(
                key,
                points
                    .iter()
                    .map(|p| (normalize(p.time_ms, origin_ms), p.value))
                    .collect::<Vec<_>>(),
            );
            if let (Some((min, max)), Some(mean)) = (points.min_max_value(), points.mean_value()) {
                stats.insert(key, ChannelStats { min, max, mean });
            }
        }

        Ok(TimeNormalized {
            origin_ms,
            series,
            stats,
            markers: build_markers(&recording.events, origin_ms),
        })
    }

    pub fn origin_ms(&self) -> u64 {
        self.origin_ms
    }

    /// Ordered (seconds, value) pairs for one channel; empty when the
    /// channel was missing or failed to load.
    pub fn channel_series(&self, slot: Slot, channel: ChannelKind) -> &[(f64, i64)] {
        self.series
            .get(&(slot, channel))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn stats(&self, slot: Slot, channel: ChannelKind) -> Option<ChannelStats> {
        self.stats.get(&(slot, channel)).copied()
    }

    pub fn markers(&self) -> &Markers {
        &self.markers
    }
}

fn normalize(timestamp_ms: u64, origin_ms: u64) -> f64 {
    (timestamp_ms - origin_ms) as f64 / 1000.0
}

/// Replays the event sequence in file order. A single pending-start slot
/// pairs intervals: a new start overwrites an unmatched one, an end without
/// a pending start is dropped, and a dangling start at the end of the log
/// produces nothing. Color indices are assigned in the order intervals
/// close, cycling through the palette.
fn build_markers(events: &[EventMark], origin_ms: u64) -> Markers {
    let mut markers = Markers::default();
    let mut pending_start: Option<f64> = None;

    for event in events {
        let at = normalize(event.timestamp_ms, origin_ms);
        match &event.kind {
            EventKind::ManualMark => markers.points.push(at),
            EventKind::IntervalStart => pending_start = Some(at),
            EventKind::IntervalEnd => {
                if let Some(start_s) = pending_start.take() {
                    let color_index = markers.intervals.len() % PALETTE_SIZE;
                    markers.intervals.push(IntervalWindow {
                        start_s,
                        end_s: at,
                        color_index,
                    });
                }
            }
            EventKind::Label(_) => {}
        }
    }

    markers
}

/// Loads one channel file. A missing file is an empty series; any malformed
/// row rejects the whole file.
pub fn load_channel(path: &Path, channel: ChannelKind) -> Result<Vec<Point>, AnalysisError> {
    let Some(mut reader) = open_reader(path, channel.header())? else {
        return Ok(Vec::new());
    };

    let mut points = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let line = index as u64 + 2;
        let record = record.map_err(|e| parse_error(path, line, e.to_string()))?;
        expect_fields(&record, 2, path, line)?;
        points.push(Point {
            time_ms: parse_field(&record, 0, "timestamp", path, line)?,
            value: parse_field(&record, 1, "value", path, line)?,
        });
    }
    Ok(points)
}

/// Loads the event log. A missing file is an empty event list.
pub fn load_events(path: &Path) -> Result<Vec<EventMark>, AnalysisError> {
    let Some(mut reader) = open_reader(path, EVENTS_HEADER)? else {
        return Ok(Vec::new());
    };

    let mut events = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let line = index as u64 + 2;
        let record = record.map_err(|e| parse_error(path, line, e.to_string()))?;
        expect_fields(&record, 2, path, line)?;
        events.push(EventMark {
            timestamp_ms: parse_field(&record, 0, "timestamp", path, line)?,
            kind: EventKind::parse(record.get(1).unwrap_or("")),
        });
    }
    Ok(events)
}

/// Opens a strict-header CSV reader, or `None` when the file is absent.
fn open_reader(
    path: &Path,
    expected_header: &str,
) -> Result<Option<csv::Reader<File>>, AnalysisError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(AnalysisError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);
    let header = reader
        .headers()
        .map_err(|e| parse_error(path, 1, e.to_string()))?
        .iter()
        .collect::<Vec<_>>()
        .join(",");
    if header != expected_header {
        return Err(parse_error(
            path,
            1,
            format!("expected header '{}', found '{}'", expected_header, header),
        ));
    }
    Ok(Some(reader))
}

fn expect_fields(
    record: &csv::StringRecord,
    expected: usize,
    path: &Path,
    line: u64,
) -> Result<(), AnalysisError> {
    if record.len() != expected {
        return Err(parse_error(
            path,
            line,
            format!("expected {} fields, found {}", expected, record.len()),
        ));
    }
    Ok(())
}

fn parse_field<T>(
    record: &csv::StringRecord,
    index: usize,
    what: &str,
    path: &Path,
    line: u64,
) -> Result<T, AnalysisError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = record.get(index).unwrap_or("");
    raw.trim()
        .parse::<T>()
        .map_err(|e| parse_error(path, line, format!("bad {} '{}': {}", what, raw, e)))
}

fn parse_error(path: &Path, line: u64, reason: String) -> AnalysisError {
    AnalysisError::Parse {
        path: path.to_path_buf(),
        line,
        reason,
    }
}
