//! Piggybacked feedback handling.
//!
//! Feedback received from the remote decompressor is queued in a ring and
//! prepended to outgoing ROHC packets. Transmission is two-phase: draining
//! an entry only *locks* it; the transaction is closed by `remove_locked`
//! (bytes were sent for sure) or `unlock` (transmission failed, send them
//! again later). A feedback entry is therefore never lost to a partial
//! write.
//!
//! The module also parses feedback packets delivered by the local
//! decompressor (RFC 3095 §5.7.6.1) so the engine can route ACKs and NACKs
//! to the right context.

use crate::constants::{
    ADD_CID_PREFIX_MASK, ADD_CID_PREFIX_VALUE, FEEDBACK_PREFIX_BASE, FEEDBACK_RING_SIZE,
    FEEDBACK_SMALL_LEN_MAX, SMALL_CID_MASK,
};
use crate::error::{CompressionError, ParseContext, RohcParsingError};
use crate::sdvl::sdvl_decode;
use crate::types::{CidType, ContextId};

/// One ring slot; an empty `data` marks the slot unused.
#[derive(Debug, Clone, Default)]
struct FeedbackSlot {
    data: Vec<u8>,
    locked: bool,
}

/// Ring of feedback entries awaiting piggybacked transmission.
///
/// Index triple: `first` is the oldest entry, `first_unlocked` the first
/// entry not yet locked by a drain, `next` the insertion point. The ring is
/// empty iff `first == next` and the slot at `first` is unused; full iff
/// `first == next` and the slot is used.
#[derive(Debug)]
pub struct FeedbackRing {
    slots: Vec<FeedbackSlot>,
    first: usize,
    first_unlocked: usize,
    next: usize,
}

impl Default for FeedbackRing {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedbackRing {
    /// Creates an empty ring of [`FEEDBACK_RING_SIZE`] slots.
    pub fn new() -> Self {
        Self {
            slots: vec![FeedbackSlot::default(); FEEDBACK_RING_SIZE],
            first: 0,
            first_unlocked: 0,
            next: 0,
        }
    }

    /// Queues feedback bytes for the next outgoing packet.
    ///
    /// # Errors
    /// - [`CompressionError::FeedbackRingFull`] - no free slot.
    pub fn piggyback(&mut self, feedback: &[u8]) -> Result<(), CompressionError> {
        if feedback.is_empty() {
            return Ok(());
        }
        if self.next == self.first && !self.slots[self.first].data.is_empty() {
            return Err(CompressionError::FeedbackRingFull);
        }
        self.slots[self.next] = FeedbackSlot {
            data: feedback.to_vec(),
            locked: false,
        };
        self.next = (self.next + 1) % FEEDBACK_RING_SIZE;
        log::debug!(
            "{} byte(s) of feedback added to the next outgoing ROHC packet",
            feedback.len()
        );
        Ok(())
    }

    /// Drains at most one entry into `out`, formatted with its RFC 3095
    /// §5.2.2 length prefix, and locks it. Returns the bytes written: 0 when
    /// nothing is available or the remaining room cannot hold the entry.
    pub fn drain_one(&mut self, out: &mut Vec<u8>, max: usize) -> usize {
        if self.is_empty() {
            return 0;
        }
        let slot = &self.slots[self.first_unlocked];
        if slot.data.is_empty() || slot.locked {
            // All available feedbacks are already locked.
            return 0;
        }
        let data_len = slot.data.len();
        let prefix_len = if data_len <= FEEDBACK_SMALL_LEN_MAX { 1 } else { 2 };
        if data_len + prefix_len > max {
            return 0;
        }

        if data_len <= FEEDBACK_SMALL_LEN_MAX {
            out.push(FEEDBACK_PREFIX_BASE | data_len as u8);
        } else {
            out.push(FEEDBACK_PREFIX_BASE);
            out.push(data_len as u8);
        }
        out.extend_from_slice(&self.slots[self.first_unlocked].data);

        self.slots[self.first_unlocked].locked = true;
        self.first_unlocked = (self.first_unlocked + 1) % FEEDBACK_RING_SIZE;
        prefix_len + data_len
    }

    /// Drains as many entries as fit in `max` bytes, locking each.
    pub fn drain_into(&mut self, out: &mut Vec<u8>, max: usize) -> usize {
        let mut total = 0;
        loop {
            let written = self.drain_one(out, max - total);
            if written == 0 {
                return total;
            }
            total += written;
        }
    }

    /// Commits the transaction: frees every locked entry.
    pub fn remove_locked(&mut self) {
        let mut removed = 0;
        while self.slots[self.first].locked {
            self.slots[self.first] = FeedbackSlot::default();
            self.first = (self.first + 1) % FEEDBACK_RING_SIZE;
            removed += 1;
        }
        debug_assert_eq!(self.first, self.first_unlocked);
        if removed > 0 {
            log::debug!("{} locked feedback(s) removed", removed);
        }
    }

    /// Rolls the transaction back: unlocks every locked entry so it is
    /// offered again on the next drain.
    pub fn unlock(&mut self) {
        let mut i = self.first;
        while self.slots[i].locked {
            self.slots[i].locked = false;
            i = (i + 1) % FEEDBACK_RING_SIZE;
        }
        self.first_unlocked = self.first;
    }

    /// Bytes of unsent, unlocked feedback including length prefixes.
    pub fn avail_bytes(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| !s.data.is_empty() && !s.locked)
            .map(|s| {
                s.data.len() + if s.data.len() <= FEEDBACK_SMALL_LEN_MAX { 1 } else { 2 }
            })
            .sum()
    }

    fn is_empty(&self) -> bool {
        self.first == self.next && self.slots[self.first].data.is_empty()
    }
}

/// The acknowledgment kinds a FEEDBACK-2 packet can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackKind {
    /// FEEDBACK-1 or FEEDBACK-2 with acktype ACK.
    Ack,
    /// FEEDBACK-2 with acktype NACK: dynamic context damage.
    Nack,
    /// FEEDBACK-2 with acktype STATIC-NACK: static context damage.
    StaticNack,
}

/// A feedback packet parsed for delivery to a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackInfo {
    pub cid: ContextId,
    pub kind: FeedbackKind,
    /// SN LSBs acknowledged by FEEDBACK-1, or the SN field of FEEDBACK-2.
    pub sn_bits: u16,
}

impl FeedbackInfo {
    /// Parses a feedback packet per RFC 3095 §5.7.6.1.
    ///
    /// The CID comes first: an optional Add-CID octet for small-CID
    /// channels, an SDVL value for large-CID channels. One remaining byte is
    /// FEEDBACK-1 (an SN LSB acknowledgment); two or more are FEEDBACK-2
    /// with the acktype in the top two bits.
    pub fn parse(data: &[u8], cid_type: CidType) -> Result<Self, RohcParsingError> {
        if data.is_empty() {
            return Err(RohcParsingError::NotEnoughData {
                needed: 1,
                got: 0,
                context: ParseContext::FeedbackPacket,
            });
        }

        let (cid, rest) = match cid_type {
            CidType::Small => {
                if data[0] & ADD_CID_PREFIX_MASK == ADD_CID_PREFIX_VALUE {
                    (
                        ContextId::new(u16::from(data[0] & SMALL_CID_MASK)),
                        &data[1..],
                    )
                } else {
                    (ContextId::new(0), data)
                }
            }
            CidType::Large => {
                let (value, consumed) = sdvl_decode(data)?;
                if consumed > 2 {
                    return Err(RohcParsingError::InvalidSdvl {
                        reason: "large CID in feedback must use 1 or 2 bytes",
                    });
                }
                (ContextId::new(value as u16), &data[consumed..])
            }
        };

        match rest.len() {
            0 => Err(RohcParsingError::NotEnoughData {
                needed: 1,
                got: 0,
                context: ParseContext::FeedbackPacket,
            }),
            1 => Ok(FeedbackInfo {
                cid,
                kind: FeedbackKind::Ack,
                sn_bits: u16::from(rest[0]),
            }),
            _ => {
                let kind = match rest[0] >> 6 {
                    0 => FeedbackKind::Ack,
                    1 => FeedbackKind::Nack,
                    _ => FeedbackKind::StaticNack,
                };
                let sn_bits = (u16::from(rest[0] & 0x0F) << 8) | u16::from(rest[1]);
                Ok(FeedbackInfo { cid, kind, sn_bits })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_locks_and_remove_commits() {
        let mut ring = FeedbackRing::new();
        ring.piggyback(&[0xAA, 0xBB]).unwrap();

        let mut out = Vec::new();
        let written = ring.drain_one(&mut out, 100);
        assert_eq!(written, 3);
        assert_eq!(out, vec![FEEDBACK_PREFIX_BASE | 2, 0xAA, 0xBB]);
        // Locked entries are not offered again.
        assert_eq!(ring.drain_one(&mut out, 100), 0);

        ring.remove_locked();
        assert_eq!(ring.avail_bytes(), 0);
        assert_eq!(ring.drain_one(&mut out, 100), 0);
    }

    #[test]
    fn unlock_restores_entries() {
        let mut ring = FeedbackRing::new();
        ring.piggyback(&[0x01]).unwrap();

        let mut out = Vec::new();
        assert_eq!(ring.drain_one(&mut out, 100), 2);
        ring.unlock();

        let mut again = Vec::new();
        assert_eq!(ring.drain_one(&mut again, 100), 2);
        assert_eq!(again, vec![FEEDBACK_PREFIX_BASE | 1, 0x01]);
    }

    #[test]
    fn long_feedback_uses_two_byte_prefix() {
        let mut ring = FeedbackRing::new();
        let payload = vec![0x42u8; 20];
        ring.piggyback(&payload).unwrap();
        assert_eq!(ring.avail_bytes(), 22);

        let mut out = Vec::new();
        assert_eq!(ring.drain_one(&mut out, 100), 22);
        assert_eq!(out[0], FEEDBACK_PREFIX_BASE);
        assert_eq!(out[1], 20);
        assert_eq!(&out[2..], payload.as_slice());
    }

    #[test]
    fn ring_reports_full() {
        let mut ring = FeedbackRing::new();
        for _ in 0..FEEDBACK_RING_SIZE {
            ring.piggyback(&[0x00]).unwrap();
        }
        assert_eq!(
            ring.piggyback(&[0x00]).unwrap_err(),
            CompressionError::FeedbackRingFull
        );
    }

    #[test]
    fn drain_respects_buffer_budget() {
        let mut ring = FeedbackRing::new();
        ring.piggyback(&[1, 2, 3]).unwrap();
        let mut out = Vec::new();
        // Needs 4 bytes, only 3 allowed.
        assert_eq!(ring.drain_one(&mut out, 3), 0);
        assert!(out.is_empty());
        assert_eq!(ring.avail_bytes(), 4);
    }

    #[test]
    fn drain_into_takes_multiple_entries() {
        let mut ring = FeedbackRing::new();
        ring.piggyback(&[0x01]).unwrap();
        ring.piggyback(&[0x02, 0x03]).unwrap();
        let mut out = Vec::new();
        assert_eq!(ring.drain_into(&mut out, 100), 5);
        assert_eq!(
            out,
            vec![
                FEEDBACK_PREFIX_BASE | 1,
                0x01,
                FEEDBACK_PREFIX_BASE | 2,
                0x02,
                0x03
            ]
        );
        ring.remove_locked();
        assert_eq!(ring.avail_bytes(), 0);
    }

    #[test]
    fn parse_feedback1_small_cid() {
        // Add-CID for CID 3, then one SN byte.
        let info = FeedbackInfo::parse(&[0xE3, 0x2A], CidType::Small).unwrap();
        assert_eq!(info.cid, 3);
        assert_eq!(info.kind, FeedbackKind::Ack);
        assert_eq!(info.sn_bits, 0x2A);
    }

    #[test]
    fn parse_feedback2_acktypes() {
        // Implicit CID 0, FEEDBACK-2: acktype in top 2 bits.
        let ack = FeedbackInfo::parse(&[0x00, 0x10], CidType::Small).unwrap();
        assert_eq!(ack.kind, FeedbackKind::Ack);
        let nack = FeedbackInfo::parse(&[0x40, 0x10], CidType::Small).unwrap();
        assert_eq!(nack.kind, FeedbackKind::Nack);
        let static_nack = FeedbackInfo::parse(&[0x80, 0x10], CidType::Small).unwrap();
        assert_eq!(static_nack.kind, FeedbackKind::StaticNack);
    }

    #[test]
    fn parse_feedback_large_cid() {
        // SDVL 1-byte CID 5, then FEEDBACK-2 NACK.
        let info = FeedbackInfo::parse(&[0x05, 0x41, 0x23], CidType::Large).unwrap();
        assert_eq!(info.cid, 5);
        assert_eq!(info.kind, FeedbackKind::Nack);
        assert_eq!(info.sn_bits, 0x123);
    }

    #[test]
    fn parse_feedback_rejects_oversized_large_cid() {
        // 3-byte SDVL form is not allowed for feedback CIDs.
        let err = FeedbackInfo::parse(&[0xC1, 0x00, 0x00, 0x10], CidType::Large).unwrap_err();
        assert!(matches!(err, RohcParsingError::InvalidSdvl { .. }));
    }
}
