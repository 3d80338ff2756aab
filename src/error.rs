//! # Error Types Module
//!
//! Centralized error handling for the PulseLab crate.
//! Provides custom error types for each module with proper context and error chaining.
//!
//! ## Error Types
//! - `FrameError`: malformed heart-rate notification payloads
//! - `ScanError`: device discovery failures
//! - `LinkError`: connection, service-discovery and subscription failures
//! - `SessionError`: recording lifecycle and persistence failures
//! - `AnalysisError`: failures while loading a persisted recording
//! - `ConfigError`: configuration file I/O and parsing errors

use std::fmt;
use std::path::PathBuf;

/// Errors produced while decoding a heart-rate measurement frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The notification payload contained no bytes at all.
    EmptyPayload,
    /// The payload ended before the heart-rate value field.
    Truncated { expected: usize, actual: usize },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::EmptyPayload => write!(f, "malformed frame: empty payload"),
            FrameError::Truncated { expected, actual } => {
                write!(
                    f,
                    "malformed frame: need {} bytes for the heart-rate field, got {}",
                    expected, actual
                )
            }
        }
    }
}

impl std::error::Error for FrameError {}

/// Errors that can occur while coordinating a device scan.
#[derive(Debug, Clone)]
pub enum ScanError {
    /// The scan capability refused to start a scan.
    StartFailed(String),
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::StartFailed(msg) => write!(f, "could not start device scan: {}", msg),
        }
    }
}

impl std::error::Error for ScanError {}

/// Errors surfaced by a device link while bringing up its stream.
///
/// These never cross the link boundary as return values; the link reports
/// them through the status log and an `Error` state transition.
#[derive(Debug, Clone)]
pub enum LinkError {
    /// Failed to connect to the device at `address`.
    Connect { address: String, reason: String },
    /// The heart-rate service or characteristic could not be located.
    Discovery { address: String, reason: String },
    /// Enabling notifications on the heart-rate characteristic failed.
    Subscribe { address: String, reason: String },
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::Connect { address, reason } => {
                write!(f, "failed to connect to device {}: {}", address, reason)
            }
            LinkError::Discovery { address, reason } => {
                write!(f, "heart-rate service lookup failed on {}: {}", address, reason)
            }
            LinkError::Subscribe { address, reason } => {
                write!(f, "could not enable notifications on {}: {}", address, reason)
            }
        }
    }
}

impl std::error::Error for LinkError {}

/// Errors from the recording session lifecycle.
#[derive(Debug)]
pub enum SessionError {
    /// The required identifier for the configured mode was blank.
    BlankId(&'static str),
    /// A recording is already in progress.
    AlreadyRecording,
    /// The recording directory or the event log could not be written.
    Io(std::io::Error),
    /// A mark was requested while no recording was active.
    NotRecording,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::BlankId(label) => write!(f, "{} ID cannot be empty", label),
            SessionError::AlreadyRecording => write!(f, "recording already in progress"),
            SessionError::Io(e) => write!(f, "recording I/O failure: {}", e),
            SessionError::NotRecording => write!(f, "must be recording to mark a timestamp"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// Errors from loading and normalizing a persisted recording.
#[derive(Debug)]
pub enum AnalysisError {
    /// A row in `path` had the wrong shape or a non-numeric field.
    /// The whole file is rejected; no partial series is kept.
    Parse {
        path: PathBuf,
        line: u64,
        reason: String,
    },
    /// A channel or event file existed but could not be read.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The recording contained no rows in any channel or event file.
    EmptyRecording,
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::Parse { path, line, reason } => {
                write!(f, "parse error in {} at line {}: {}", path.display(), line, reason)
            }
            AnalysisError::Io { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            AnalysisError::EmptyRecording => {
                write!(f, "recording contains no data to normalize")
            }
        }
    }
}

impl std::error::Error for AnalysisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AnalysisError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors that can occur during configuration operations.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read config file
    ReadFailed(std::io::Error),
    /// Failed to write config file
    WriteFailed(std::io::Error),
    /// Failed to parse config file
    ParseFailed(toml::de::Error),
    /// Failed to serialize config
    SerializeFailed(toml::ser::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ReadFailed(e) => {
                write!(f, "Failed to read config file: {}", e)
            }
            ConfigError::WriteFailed(e) => {
                write!(f, "Failed to write config file: {}", e)
            }
            ConfigError::ParseFailed(e) => {
                write!(f, "Failed to parse config file: {}", e)
            }
            ConfigError::SerializeFailed(e) => {
                write!(f, "Failed to serialize config: {}", e)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadFailed(e) => Some(e),
            ConfigError::WriteFailed(e) => Some(e),
            ConfigError::ParseFailed(e) => Some(e),
            ConfigError::SerializeFailed(e) => Some(e),
        }
    }
}
