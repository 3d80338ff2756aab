//! On-disk layout of a recording.
//!
//! The session writes this layout; the analysis loader reads it back. Two
//! shapes exist, selected by the session mode:
//!
//! ```text
//! <root>/SingleRecordings/<participantId>/{hr.csv, rr.csv, timestamps.csv}
//! <root>/<groupId>/Participant_1/{hr.csv, rr.csv}
//! <root>/<groupId>/Participant_2/{hr.csv, rr.csv}
//! <root>/<groupId>/timestamps.csv
//! ```

use std::path::{Path, PathBuf};

pub const SINGLE_RECORDINGS_DIR: &str = "SingleRecordings";
pub const EVENTS_FILE: &str = "timestamps.csv";
pub const EVENTS_HEADER: &str = "timestamp,event_type";

/// Participant position within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    One,
    Two,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::One, Slot::Two];

    pub fn dir_name(self) -> &'static str {
        match self {
            Slot::One => "Participant_1",
            Slot::Two => "Participant_2",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Slot::One => "P1",
            Slot::Two => "P2",
        }
    }
}

/// Whether a session records one participant or a group of two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMode {
    Single,
    Group,
}

impl SessionMode {
    pub fn slots(&self) -> &'static [Slot] {
        match self {
            SessionMode::Single => &[Slot::One],
            SessionMode::Group => &Slot::ALL,
        }
    }

    pub fn id_label(&self) -> &'static str {
        match self {
            SessionMode::Single => "Participant",
            SessionMode::Group => "Group",
        }
    }
}

/// A named physiological series for one participant slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Hr,
    Rr,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 2] = [ChannelKind::Hr, ChannelKind::Rr];

    pub fn file_name(self) -> &'static str {
        match self {
            ChannelKind::Hr => "hr.csv",
            ChannelKind::Rr => "rr.csv",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            ChannelKind::Hr => "timestamp,hr",
            ChannelKind::Rr => "timestamp,rr_ms",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ChannelKind::Hr => "Heart Rate",
            ChannelKind::Rr => "RR Intervals",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            ChannelKind::Hr => "BPM",
            ChannelKind::Rr => "ms",
        }
    }
}

/// Resolves the paths of one recording's directory tree.
#[derive(Debug, Clone)]
pub struct RecordingLayout {
    recording_dir: PathBuf,
    mode: SessionMode,
}

impl RecordingLayout {
    /// Layout for a new recording under `output_root`.
    pub fn new(output_root: &Path, mode: SessionMode, id: &str) -> Self {
        let recording_dir = match mode {
            SessionMode::Single => output_root.join(SINGLE_RECORDINGS_DIR).join(id),
            SessionMode::Group => output_root.join(id),
        };
        Self { recording_dir, mode }
    }

    /// Layout of an existing recording directory, probing for the group
    /// shape. A directory without `Participant_1` is read as a single
    /// recording with its channel files at the top level.
    pub fn from_dir(dir: &Path) -> Self {
        let mode = if dir.join(Slot::One.dir_name()).is_dir() {
            SessionMode::Group
        } else {
            SessionMode::Single
        };
        Self {
            recording_dir: dir.to_path_buf(),
            mode,
        }
    }

    pub fn mode(&self) -> &SessionMode {
        &self.mode
    }

    pub fn recording_dir(&self) -> &Path {
        &self.recording_dir
    }

    pub fn slot_dir(&self, slot: Slot) -> PathBuf {
        match (&self.mode, slot) {
            (SessionMode::Single, Slot::One) => self.recording_dir.clone(),
            _ => self.recording_dir.join(slot.dir_name()),
        }
    }

    pub fn channel_file(&self, slot: Slot, channel: ChannelKind) -> PathBuf {
        self.slot_dir(slot).join(channel.file_name())
    }

    pub fn events_file(&self) -> PathBuf {
        self.recording_dir.join(EVENTS_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_layout_keeps_channels_at_top_level() {
        let layout = RecordingLayout::new(Path::new("/data"), SessionMode::Single, "P7");
        assert_eq!(
            layout.recording_dir(),
            Path::new("/data/SingleRecordings/P7")
        );
        assert_eq!(
            layout.channel_file(Slot::One, ChannelKind::Hr),
            PathBuf::from("/data/SingleRecordings/P7/hr.csv")
        );
        assert_eq!(
            layout.events_file(),
            PathBuf::from("/data/SingleRecordings/P7/timestamps.csv")
        );
    }

    #[test]
    fn group_layout_nests_participant_dirs() {
        let layout = RecordingLayout::new(Path::new("/data"), SessionMode::Group, "G12");
        assert_eq!(layout.recording_dir(), Path::new("/data/G12"));
        assert_eq!(
            layout.channel_file(Slot::One, ChannelKind::Hr),
            PathBuf::from("/data/G12/Participant_1/hr.csv")
        );
        assert_eq!(
            layout.channel_file(Slot::Two, ChannelKind::Rr),
            PathBuf::from("/data/G12/Participant_2/rr.csv")
        );
        assert_eq!(layout.events_file(), PathBuf::from("/data/G12/timestamps.csv"));
    }

    #[test]
    fn probing_detects_group_shape() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("Participant_1")).unwrap();
        let layout = RecordingLayout::from_dir(dir.path());
        assert_eq!(layout.mode(), &SessionMode::Group);

        let flat = tempfile::tempdir().unwrap();
        let layout = RecordingLayout::from_dir(flat.path());
        assert_eq!(layout.mode(), &SessionMode::Single);
    }
}
