//! Event-mark vocabulary shared by the recording session (writer) and the
//! analysis loader (reader).

use std::fmt;

/// Kind of a user-marked event on the session timeline.
///
/// The three built-in kinds drive interval pairing and point markers at
/// analysis time; any other caller-supplied label round-trips through the
/// event log untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    ManualMark,
    IntervalStart,
    IntervalEnd,
    Label(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::ManualMark => "manual_mark",
            EventKind::IntervalStart => "interval_start",
            EventKind::IntervalEnd => "interval_end",
            EventKind::Label(label) => label,
        }
    }

    /// Parses the persisted cell back into a kind. Unknown strings become
    /// labels rather than errors.
    pub fn parse(raw: &str) -> EventKind {
        match raw {
            "manual_mark" => EventKind::ManualMark,
            "interval_start" => EventKind::IntervalStart,
            "interval_end" => EventKind::IntervalEnd,
            other => EventKind::Label(other.to_string()),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One accepted event: the wall-clock time the writer stamped at acceptance
/// plus the kind. Within a session, file order equals timestamp order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMark {
    pub timestamp_ms: u64,
    pub kind: EventKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_kinds_round_trip() {
        for kind in [
            EventKind::ManualMark,
            EventKind::IntervalStart,
            EventKind::IntervalEnd,
        ] {
            assert_eq!(EventKind::parse(kind.as_str()), kind);
        }
    }

    #[test]
    fn unknown_kind_becomes_label() {
        let kind = EventKind::parse("baseline_done");
        assert_eq!(kind, EventKind::Label("baseline_done".to_string()));
        assert_eq!(kind.as_str(), "baseline_done");
    }
}
