//! PulseLab: records heart-rate and RR-interval streams from up to two
//! wireless sensors into per-participant CSV series with user-marked events,
//! and reconstructs time-normalized statistics and markers from a finished
//! recording.

pub mod analysis;
pub mod capability;
pub mod config;
pub mod error;
pub mod events;
pub mod frame;
pub mod layout;
pub mod link;
pub mod scanner;
pub mod session;
pub mod statuslog;
pub mod timeseries;

pub use analysis::{Recording, TimeNormalized};
pub use capability::Device;
pub use events::{EventKind, EventMark};
pub use frame::{decode, DecodedFrame, Sample, SampleKind};
pub use layout::{ChannelKind, SessionMode, Slot};
pub use link::{ConnectionState, DeviceLink, LinkCommand, LinkEvent};
pub use session::RecordingSession;
pub use statuslog::StatusLog;
