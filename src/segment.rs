//! ROHC segmentation (RFC 3095 §5.2.5).
//!
//! When a compressed packet does not fit the caller's output buffer but is
//! no larger than the MRRU, it is staged here as a Reconstructed Reception
//! Unit: header bytes, payload bytes, and a 4-byte FCS-32 over both. The
//! unit is then emitted as a FIFO chain of segments, each prefixed with
//! `11111110` (`11111111` on the final one); the decompressor reassembles
//! in order and validates the FCS.

use crate::constants::{SEGMENT_TYPE_FINAL, SEGMENT_TYPE_NON_FINAL};
use crate::crc::CrcCalculators;
use crate::error::CompressionError;

/// Length in bytes of the FCS-32 trailer protecting an RRU.
pub const FCS32_LEN: usize = 4;

/// Staging buffer for one oversized ROHC packet awaiting segmentation.
#[derive(Debug, Default)]
pub struct SegmentBuffer {
    rru: Vec<u8>,
    offset: usize,
}

/// Whether more segments remain after a `next_segment` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentStatus {
    /// The emitted segment was the last one.
    Final,
    /// More segments are available.
    MoreSegments,
}

impl SegmentBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when an RRU is staged and not yet fully emitted.
    pub fn has_rru(&self) -> bool {
        self.offset < self.rru.len()
    }

    /// Remaining bytes (FCS included) still to be emitted.
    pub fn remaining(&self) -> usize {
        self.rru.len() - self.offset
    }

    /// Stages `header ‖ payload ‖ FCS-32(header ‖ payload)` as the RRU.
    ///
    /// Any previously staged, unretrieved RRU is discarded with a warning.
    pub fn store(&mut self, header: &[u8], payload: &[u8], crc: &CrcCalculators) {
        if self.has_rru() {
            log::warn!(
                "erase the existing {}-byte RRU that was not retrieved yet \
                 (call get_segment() to add support for ROHC segments)",
                self.remaining()
            );
        }
        self.rru.clear();
        self.offset = 0;
        self.rru.reserve(header.len() + payload.len() + FCS32_LEN);
        self.rru.extend_from_slice(header);
        self.rru.extend_from_slice(payload);
        let fcs = crc.fcs32(&self.rru);
        self.rru.extend_from_slice(&fcs.to_be_bytes());
        log::debug!("RRU 32-bit FCS = 0x{:08x}", fcs);
    }

    /// Appends the next segment to `out`, using at most `max` bytes.
    ///
    /// The segment is a type octet followed by as much of the remaining RRU
    /// as fits. Returns whether more segments remain.
    ///
    /// # Errors
    /// - [`CompressionError::NoRruAvailable`] - nothing staged.
    /// - [`CompressionError::PacketTooLarge`] - `max` cannot hold the type
    ///   octet plus at least one data byte.
    pub fn next_segment(
        &mut self,
        out: &mut Vec<u8>,
        max: usize,
    ) -> Result<SegmentStatus, CompressionError> {
        if !self.has_rru() {
            return Err(CompressionError::NoRruAvailable);
        }
        if max < 2 {
            return Err(CompressionError::PacketTooLarge {
                packet_len: self.remaining() + 1,
                available: max,
                mrru: 0,
            });
        }

        let data_len = (max - 1).min(self.remaining());
        let is_final = data_len == self.remaining();
        out.push(if is_final {
            SEGMENT_TYPE_FINAL
        } else {
            SEGMENT_TYPE_NON_FINAL
        });
        out.extend_from_slice(&self.rru[self.offset..self.offset + data_len]);
        self.offset += data_len;

        if is_final {
            // Reset for the next RRU.
            self.rru.clear();
            self.offset = 0;
            Ok(SegmentStatus::Final)
        } else {
            Ok(SegmentStatus::MoreSegments)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reassemble(segments: &[Vec<u8>]) -> Vec<u8> {
        let mut unit = Vec::new();
        for (i, seg) in segments.iter().enumerate() {
            let expected_type = if i + 1 == segments.len() {
                SEGMENT_TYPE_FINAL
            } else {
                SEGMENT_TYPE_NON_FINAL
            };
            assert_eq!(seg[0], expected_type);
            unit.extend_from_slice(&seg[1..]);
        }
        unit
    }

    #[test]
    fn rru_carries_fcs32_trailer() {
        let crc = CrcCalculators::new();
        let mut buffer = SegmentBuffer::new();
        buffer.store(&[1, 2, 3], &[4, 5], &crc);
        assert!(buffer.has_rru());
        assert_eq!(buffer.remaining(), 3 + 2 + FCS32_LEN);
    }

    #[test]
    fn segments_chain_and_reassemble() {
        let crc = CrcCalculators::new();
        let mut buffer = SegmentBuffer::new();
        let header = vec![0xAB; 10];
        let payload = vec![0xCD; 25];
        buffer.store(&header, &payload, &crc);

        let mut segments = Vec::new();
        loop {
            let mut seg = Vec::new();
            let status = buffer.next_segment(&mut seg, 16).unwrap();
            segments.push(seg);
            if status == SegmentStatus::Final {
                break;
            }
        }
        assert!(segments.len() > 1);
        assert!(!buffer.has_rru());

        let unit = reassemble(&segments);
        assert_eq!(unit.len(), header.len() + payload.len() + FCS32_LEN);
        assert_eq!(&unit[..10], header.as_slice());
        assert_eq!(&unit[10..35], payload.as_slice());

        // FCS-32 over the reassembled content verifies.
        let fcs = u32::from_be_bytes([unit[35], unit[36], unit[37], unit[38]]);
        assert_eq!(crc.fcs32(&unit[..35]), fcs);
    }

    #[test]
    fn final_segment_resets_buffer() {
        let crc = CrcCalculators::new();
        let mut buffer = SegmentBuffer::new();
        buffer.store(&[1], &[2], &crc);

        let mut seg = Vec::new();
        assert_eq!(
            buffer.next_segment(&mut seg, 100).unwrap(),
            SegmentStatus::Final
        );
        assert_eq!(seg[0], SEGMENT_TYPE_FINAL);
        assert!(matches!(
            buffer.next_segment(&mut Vec::new(), 100),
            Err(CompressionError::NoRruAvailable)
        ));
    }

    #[test]
    fn tiny_output_buffer_is_rejected() {
        let crc = CrcCalculators::new();
        let mut buffer = SegmentBuffer::new();
        buffer.store(&[1, 2], &[], &crc);
        assert!(matches!(
            buffer.next_segment(&mut Vec::new(), 1),
            Err(CompressionError::PacketTooLarge { .. })
        ));
    }

    #[test]
    fn restaging_discards_previous_rru() {
        let crc = CrcCalculators::new();
        let mut buffer = SegmentBuffer::new();
        buffer.store(&[1, 2, 3], &[], &crc);
        buffer.store(&[9], &[], &crc);
        assert_eq!(buffer.remaining(), 1 + FCS32_LEN);
    }
}
