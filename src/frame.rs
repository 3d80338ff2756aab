//! Heart-rate measurement frame decoding.
//!
//! A notification payload follows the standard heart-rate-measurement
//! characteristic layout: a flags byte, the heart-rate value in 8- or 16-bit
//! little-endian form, then an optional run of 16-bit little-endian
//! RR-interval values filling the rest of the payload.

use crate::error::FrameError;

/// Flags bit 0: heart-rate value is a 16-bit little-endian field.
const FLAG_HR_16BIT: u8 = 0x01;
/// Flags bit 4: one or more RR-interval values follow the heart-rate field.
const FLAG_RR_PRESENT: u8 = 0x10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    HeartRate,
    RrInterval,
}

/// One decoded physiological value stamped with its frame's arrival time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub kind: SampleKind,
    pub value: u16,
    pub timestamp_ms: u64,
}

/// Decoded contents of one notification frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub heart_rate: Sample,
    pub rr_intervals: Vec<Sample>,
}

/// Decodes one raw notification payload.
///
/// The RR block has no count field; values are consumed two bytes at a time
/// until fewer than two bytes remain, so an odd trailing byte is silently
/// ignored. Every sample in the frame shares `arrival_ms` — RR values carry
/// the receive time, not a reconstructed per-beat time. Flag bits other than
/// 0x01 and 0x10 (sensor contact, energy expenditure) are ignored.
pub fn decode(raw: &[u8], arrival_ms: u64) -> Result<DecodedFrame, FrameError> {
    let flags = *raw.first().ok_or(FrameError::EmptyPayload)?;
    let wide = flags & FLAG_HR_16BIT != 0;
    let rr_offset = if wide { 3 } else { 2 };
    if raw.len() < rr_offset {
        return Err(FrameError::Truncated {
            expected: rr_offset,
            actual: raw.len(),
        });
    }

    let bpm = if wide {
        u16::from_le_bytes([raw[1], raw[2]])
    } else {
        raw[1] as u16
    };
    let heart_rate = Sample {
        kind: SampleKind::HeartRate,
        value: bpm,
        timestamp_ms: arrival_ms,
    };

    let mut rr_intervals = Vec::new();
    if flags & FLAG_RR_PRESENT != 0 {
        let mut offset = rr_offset;
        while offset + 2 <= raw.len() {
            rr_intervals.push(Sample {
                kind: SampleKind::RrInterval,
                value: u16::from_le_bytes([raw[offset], raw[offset + 1]]),
                timestamp_ms: arrival_ms,
            });
            offset += 2;
        }
    }

    Ok(DecodedFrame {
        heart_rate,
        rr_intervals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_frame_without_rr_yields_single_sample() {
        let frame = decode(&[0x00, 72], 5_000).unwrap();
        assert_eq!(frame.heart_rate.value, 72);
        assert_eq!(frame.heart_rate.kind, SampleKind::HeartRate);
        assert_eq!(frame.heart_rate.timestamp_ms, 5_000);
        assert!(frame.rr_intervals.is_empty());
    }

    #[test]
    fn wide_frame_reads_little_endian_bpm() {
        // 0x0141 = 321 bpm, nonsense physiologically but exercises the width
        let frame = decode(&[0x01, 0x41, 0x01], 0).unwrap();
        assert_eq!(frame.heart_rate.value, 321);
        assert!(frame.rr_intervals.is_empty());
    }

    #[test]
    fn wide_frame_with_rr_block_yields_every_pair() {
        // flags 0x11: 16-bit HR + RR present; two RR values follow
        let raw = [0x11, 0x48, 0x00, 0x20, 0x03, 0x52, 0x03];
        let frame = decode(&raw, 9_999).unwrap();
        assert_eq!(frame.heart_rate.value, 72);
        let values: Vec<u16> = frame.rr_intervals.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![0x0320, 0x0352]);
        assert!(frame
            .rr_intervals
            .iter()
            .all(|s| s.kind == SampleKind::RrInterval && s.timestamp_ms == 9_999));
    }

    #[test]
    fn narrow_frame_rr_block_starts_at_offset_two() {
        let raw = [0x10, 80, 0xE8, 0x02];
        let frame = decode(&raw, 1).unwrap();
        assert_eq!(frame.heart_rate.value, 80);
        assert_eq!(frame.rr_intervals.len(), 1);
        assert_eq!(frame.rr_intervals[0].value, 744);
    }

    #[test]
    fn odd_trailing_byte_is_dropped() {
        let raw = [0x10, 80, 0xE8, 0x02, 0x55];
        let frame = decode(&raw, 1).unwrap();
        assert_eq!(frame.rr_intervals.len(), 1);
        assert_eq!(frame.rr_intervals[0].value, 744);
    }

    #[test]
    fn rr_bytes_without_flag_are_ignored() {
        let raw = [0x00, 80, 0xE8, 0x02];
        let frame = decode(&raw, 1).unwrap();
        assert!(frame.rr_intervals.is_empty());
    }

    #[test]
    fn empty_payload_is_malformed() {
        assert_eq!(decode(&[], 0), Err(FrameError::EmptyPayload));
    }

    #[test]
    fn payload_shorter_than_hr_field_is_malformed() {
        assert!(matches!(
            decode(&[0x01, 0x48], 0),
            Err(FrameError::Truncated { expected: 3, actual: 2 })
        ));
        assert!(matches!(
            decode(&[0x00], 0),
            Err(FrameError::Truncated { expected: 2, actual: 1 })
        ));
    }
}
