//! The ROHC compressor engine.
//!
//! [`RohcCompressor`] bundles the whole compression side of a ROHC channel:
//! configuration (CID space, MRRU, W-LSB width, refresh timeouts, enabled
//! profiles, RTP detection), the per-flow context store, the piggybacked
//! feedback ring, and the segmentation buffer.
//!
//! Per packet, [`compress`] parses the IP chain, selects the first enabled
//! profile accepting the packet, finds or creates the flow's context,
//! drains pending feedback, encodes the ROHC header, and appends the
//! payload; oversized results are staged for [`get_segment`]. A profile
//! that fails mid-encode falls back to the Uncompressed profile for this
//! packet.
//!
//! [`compress`]: RohcCompressor::compress
//! [`get_segment`]: RohcCompressor::get_segment

use std::collections::HashSet;
use std::fmt;
use std::time::Instant;

use crate::constants::{MAX_FEEDBACK_PREFIX_BYTES, MAX_RTP_PORTS, ROHC_MAX_MRRU};
use crate::constants::{CHANGE_TO_FO_COUNT, CHANGE_TO_IR_COUNT, DEFAULT_WLSB_WINDOW_WIDTH};
use crate::context::{ContextState, ContextStore, RohcMode};
use crate::crc::CrcCalculators;
use crate::error::{CompressionError, ParseContext, RohcError, RohcParsingError};
use crate::feedback::{FeedbackInfo, FeedbackRing};
use crate::headers::PacketHeaders;
use crate::profiles::{
    handler_for, registry, ContextParams, EncodeSettings, PacketType, ProfileHandler, RohcProfile,
    RtpDetector, SelectionContext,
};
use crate::segment::{SegmentBuffer, SegmentStatus, FCS32_LEN};
use crate::types::{CidType, ContextId};

/// Result of a successful [`RohcCompressor::compress`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressOutcome {
    /// A complete ROHC packet of this many bytes was written.
    Packet(usize),
    /// The packet was staged for segmentation; call
    /// [`RohcCompressor::get_segment`] to retrieve the segments.
    NeedsSegmentation,
}

/// One segment returned by [`RohcCompressor::get_segment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentOutput {
    /// Bytes written into the caller's buffer.
    pub len: usize,
    /// No more segments remain after this one.
    pub is_final: bool,
}

/// Aggregate counters of one compressor instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GeneralInfo {
    pub contexts_nr: usize,
    pub packets_nr: u64,
    pub uncomp_bytes_nr: u64,
    pub comp_bytes_nr: u64,
}

/// Information about the last compressed packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastPacketInfo {
    pub context_id: ContextId,
    /// The context was initialized by this packet.
    pub is_context_init: bool,
    pub context_mode: RohcMode,
    pub context_state: ContextState,
    pub profile: RohcProfile,
    pub packet_type: PacketType,
    pub total_last_uncomp_size: usize,
    pub header_last_uncomp_size: usize,
    pub total_last_comp_size: usize,
    pub header_last_comp_size: usize,
}

/// A ROHC compressor instance.
///
/// All operations must be externally serialized; distinct instances are
/// fully independent.
pub struct RohcCompressor {
    cid_type: CidType,
    max_cid: ContextId,
    mrru: usize,
    wlsb_width: usize,
    ir_refresh_timeout: u32,
    fo_refresh_timeout: u32,
    enabled_profiles: HashSet<RohcProfile>,
    rtp_ports: Vec<u16>,
    rtp_detector: Option<Box<RtpDetector>>,
    random_fn: Box<dyn FnMut() -> u16 + Send>,
    crc: CrcCalculators,
    contexts: ContextStore,
    feedback: FeedbackRing,
    segmenter: SegmentBuffer,
    num_packets: u64,
    total_uncompressed_size: u64,
    total_compressed_size: u64,
    last_cid: Option<ContextId>,
}

impl fmt::Debug for RohcCompressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RohcCompressor")
            .field("cid_type", &self.cid_type)
            .field("max_cid", &self.max_cid)
            .field("mrru", &self.mrru)
            .field("num_packets", &self.num_packets)
            .field("contexts_used", &self.contexts.num_used())
            .finish_non_exhaustive()
    }
}

impl RohcCompressor {
    /// Creates a compressor for the given CID space.
    ///
    /// All profiles start disabled; enable the wanted set with
    /// [`enable_profile`] before compressing. Segmentation starts disabled
    /// (MRRU 0).
    ///
    /// # Errors
    /// - [`CompressionError::InvalidConfiguration`] - `max_cid` outside the
    ///   CID type's range.
    ///
    /// [`enable_profile`]: Self::enable_profile
    pub fn new(cid_type: CidType, max_cid: ContextId) -> Result<Self, RohcError> {
        if max_cid > cid_type.max_cid() {
            return Err(CompressionError::InvalidConfiguration {
                reason: "MAX_CID exceeds the CID type's range",
            }
            .into());
        }
        Ok(Self {
            cid_type,
            max_cid,
            mrru: 0,
            wlsb_width: DEFAULT_WLSB_WINDOW_WIDTH,
            ir_refresh_timeout: CHANGE_TO_IR_COUNT,
            fo_refresh_timeout: CHANGE_TO_FO_COUNT,
            enabled_profiles: HashSet::new(),
            rtp_ports: Vec::new(),
            rtp_detector: None,
            random_fn: Box::new(rand::random::<u16>),
            crc: CrcCalculators::new(),
            contexts: ContextStore::new(max_cid),
            feedback: FeedbackRing::new(),
            segmenter: SegmentBuffer::new(),
            num_packets: 0,
            total_uncompressed_size: 0,
            total_compressed_size: 0,
            last_cid: None,
        })
    }

    fn ensure_unfrozen(&self) -> Result<(), CompressionError> {
        if self.num_packets > 0 {
            Err(CompressionError::ConfigurationFrozen)
        } else {
            Ok(())
        }
    }

    /// Sets the width of every W-LSB sliding window. Must be a power of
    /// two; frozen once the first packet has been compressed.
    pub fn set_wlsb_window_width(&mut self, width: usize) -> Result<(), RohcError> {
        self.ensure_unfrozen()?;
        if width == 0 || !width.is_power_of_two() {
            return Err(CompressionError::InvalidConfiguration {
                reason: "W-LSB window width must be a power of two",
            }
            .into());
        }
        self.wlsb_width = width;
        Ok(())
    }

    /// Sets the periodic refresh timeouts, in packets. `ir` must be
    /// greater than `fo`, both non-zero.
    pub fn set_periodic_refreshes(&mut self, ir: u32, fo: u32) -> Result<(), RohcError> {
        self.ensure_unfrozen()?;
        if ir == 0 || fo == 0 || ir <= fo {
            return Err(CompressionError::InvalidConfiguration {
                reason: "refresh timeouts require IR > FO > 0",
            }
            .into());
        }
        self.ir_refresh_timeout = ir;
        self.fo_refresh_timeout = fo;
        Ok(())
    }

    /// Sets the MRRU in bytes (CRC included). 0 disables segmentation.
    pub fn set_mrru(&mut self, mrru: usize) -> Result<(), RohcError> {
        self.ensure_unfrozen()?;
        if mrru > ROHC_MAX_MRRU {
            return Err(CompressionError::InvalidConfiguration {
                reason: "MRRU exceeds the protocol maximum",
            }
            .into());
        }
        self.mrru = mrru;
        Ok(())
    }

    /// Replaces the RTP detection callback. `None` falls back to the RTP
    /// port list.
    pub fn set_rtp_detection_cb(
        &mut self,
        callback: Option<Box<RtpDetector>>,
    ) -> Result<(), RohcError> {
        self.ensure_unfrozen()?;
        self.rtp_detector = callback;
        Ok(())
    }

    /// Replaces the random source used to initialize sequence numbers.
    pub fn set_random_fn(
        &mut self,
        random_fn: Box<dyn FnMut() -> u16 + Send>,
    ) -> Result<(), RohcError> {
        self.ensure_unfrozen()?;
        self.random_fn = random_fn;
        Ok(())
    }

    /// Enables a compression profile. Enabling an already enabled profile
    /// succeeds silently.
    pub fn enable_profile(&mut self, profile: RohcProfile) -> Result<(), RohcError> {
        if handler_for(profile).is_none() {
            log::warn!("unknown ROHC compression profile (ID = 0x{:04x})", u16::from(profile));
            return Err(CompressionError::InvalidConfiguration {
                reason: "profile is not implemented",
            }
            .into());
        }
        self.enabled_profiles.insert(profile);
        Ok(())
    }

    /// Disables a compression profile.
    pub fn disable_profile(&mut self, profile: RohcProfile) -> Result<(), RohcError> {
        if handler_for(profile).is_none() {
            return Err(CompressionError::InvalidConfiguration {
                reason: "profile is not implemented",
            }
            .into());
        }
        self.enabled_profiles.remove(&profile);
        Ok(())
    }

    /// Enables several profiles; fails if any is unknown.
    pub fn enable_profiles(&mut self, profiles: &[RohcProfile]) -> Result<(), RohcError> {
        for &profile in profiles {
            self.enable_profile(profile)?;
        }
        Ok(())
    }

    /// Disables several profiles; fails if any is unknown.
    pub fn disable_profiles(&mut self, profiles: &[RohcProfile]) -> Result<(), RohcError> {
        for &profile in profiles {
            self.disable_profile(profile)?;
        }
        Ok(())
    }

    /// Adds a UDP port to the list dedicated to RTP traffic. The list is
    /// kept sorted; duplicates and port 0 are rejected.
    pub fn add_rtp_port(&mut self, port: u16) -> Result<(), RohcError> {
        if port == 0 {
            return Err(CompressionError::InvalidConfiguration {
                reason: "invalid RTP port number",
            }
            .into());
        }
        if self.rtp_ports.len() >= MAX_RTP_PORTS {
            log::warn!("can not add a new RTP port, the list is full");
            return Err(CompressionError::InvalidConfiguration {
                reason: "RTP port list is full",
            }
            .into());
        }
        match self.rtp_ports.binary_search(&port) {
            Ok(_) => {
                log::warn!("port {} is already in the list", port);
                Err(CompressionError::InvalidConfiguration {
                    reason: "RTP port already registered",
                }
                .into())
            }
            Err(idx) => {
                self.rtp_ports.insert(idx, port);
                Ok(())
            }
        }
    }

    /// Removes a UDP port from the RTP list and destroys every context
    /// that compresses a flow over that port.
    pub fn remove_rtp_port(&mut self, port: u16) -> Result<(), RohcError> {
        if port == 0 {
            return Err(CompressionError::InvalidConfiguration {
                reason: "invalid RTP port number",
            }
            .into());
        }
        let Ok(idx) = self.rtp_ports.binary_search(&port) else {
            log::warn!("port {} is not in the list", port);
            return Err(CompressionError::InvalidConfiguration {
                reason: "RTP port not registered",
            }
            .into());
        };
        self.rtp_ports.remove(idx);

        self.contexts.destroy_where(|ctx| {
            handler_for(ctx.profile)
                .map_or(false, |handler| handler.uses_udp_port(&ctx.data, port))
        });
        Ok(())
    }

    /// Empties the RTP port list.
    pub fn reset_rtp_ports(&mut self) {
        self.rtp_ports.clear();
    }

    /// Compresses one IP packet into `out`.
    ///
    /// `arrival_time` feeds the context usage timestamps; `None` disables
    /// the time-dependent bookkeeping (packet-count refreshes still
    /// operate).
    ///
    /// On [`CompressOutcome::NeedsSegmentation`] no bytes are written;
    /// retrieve the packet with [`get_segment`]. Pending feedback is
    /// consumed on success and restored on failure.
    ///
    /// # Errors
    /// - [`RohcParsingError`] variants - the packet is not valid IP.
    /// - [`CompressionError::NoProfileFound`] - no enabled profile accepts
    ///   the packet.
    /// - [`CompressionError::PacketTooLarge`] - the result fits neither the
    ///   buffer nor the MRRU.
    ///
    /// [`get_segment`]: Self::get_segment
    pub fn compress(
        &mut self,
        arrival_time: Option<Instant>,
        packet: &[u8],
        out: &mut [u8],
    ) -> Result<CompressOutcome, RohcError> {
        if packet.is_empty() {
            return Err(RohcParsingError::NotEnoughData {
                needed: 1,
                got: 0,
                context: ParseContext::UncompressedPacket,
            }
            .into());
        }
        let headers = PacketHeaders::parse(packet)?;

        let (mut handler, key) = {
            let selection = SelectionContext {
                rtp_ports: &self.rtp_ports,
                rtp_detector: self.rtp_detector.as_deref(),
            };
            registry()
                .iter()
                .copied()
                .filter(|p| self.enabled_profiles.contains(&p.profile_id()))
                .find_map(|p| p.accepts(packet, &headers, &selection).map(|key| (p, key)))
                .ok_or(CompressionError::NoProfileFound {
                    protocol: headers.next_protocol,
                })?
        };
        log::debug!(
            "using profile '{}' (0x{:04x})",
            handler.description(),
            u16::from(handler.profile_id())
        );

        let mut cid = self.find_or_create_context(handler, key, packet, &headers, arrival_time)?;

        // Feedback is drained first; it is committed or restored at the end
        // of the call depending on the outcome.
        let mut staged = Vec::with_capacity(128);
        self.feedback
            .drain_into(&mut staged, out.len().min(MAX_FEEDBACK_PREFIX_BYTES));
        let feedbacks_size = staged.len();

        let mut header_buf = Vec::with_capacity(64);
        let settings = EncodeSettings {
            crc: &self.crc,
            cid_type: self.cid_type,
            cid,
            ir_refresh_timeout: self.ir_refresh_timeout,
            fo_refresh_timeout: self.fo_refresh_timeout,
        };
        let context = self
            .contexts
            .get_mut(cid)
            .ok_or(CompressionError::ContextNotFound { cid })?;
        let encoded = match handler.encode(context, packet, &headers, &settings, &mut header_buf) {
            Ok(encoded) => encoded,
            Err(err) => {
                // Profile failed mid-packet: fall back to Uncompressed.
                log::warn!(
                    "error while compressing with the profile, using uncompressed profile: {}",
                    err
                );
                self.destroy_if_unused(cid);

                if !self.enabled_profiles.contains(&RohcProfile::Uncompressed) {
                    self.feedback.unlock();
                    return Err(err);
                }
                let fallback = handler_for(RohcProfile::Uncompressed)
                    .ok_or(CompressionError::NoProfileFound {
                        protocol: headers.next_protocol,
                    })?;
                // The floor profile ignores the RTP selection inputs.
                let fallback_selection = SelectionContext {
                    rtp_ports: &[],
                    rtp_detector: None,
                };
                let fallback_key = fallback
                    .accepts(packet, &headers, &fallback_selection)
                    .ok_or(CompressionError::NoProfileFound {
                        protocol: headers.next_protocol,
                    })?;
                handler = fallback;
                cid = match self.find_or_create_context(
                    fallback,
                    fallback_key,
                    packet,
                    &headers,
                    arrival_time,
                ) {
                    Ok(cid) => cid,
                    Err(create_err) => {
                        self.feedback.unlock();
                        return Err(create_err);
                    }
                };
                header_buf.clear();
                let settings = EncodeSettings {
                    crc: &self.crc,
                    cid_type: self.cid_type,
                    cid,
                    ir_refresh_timeout: self.ir_refresh_timeout,
                    fo_refresh_timeout: self.fo_refresh_timeout,
                };
                let context = self
                    .contexts
                    .get_mut(cid)
                    .ok_or(CompressionError::ContextNotFound { cid })?;
                match fallback.encode(context, packet, &headers, &settings, &mut header_buf) {
                    Ok(encoded) => encoded,
                    Err(fallback_err) => {
                        log::warn!(
                            "error while compressing with uncompressed profile, giving up"
                        );
                        self.destroy_if_unused(cid);
                        self.feedback.unlock();
                        return Err(fallback_err);
                    }
                }
            }
        };

        let payload = &packet[encoded.payload_offset..headers.total_length];
        let rohc_len = staged.len() + header_buf.len() + payload.len();

        let outcome = if rohc_len <= out.len() {
            out[..staged.len()].copy_from_slice(&staged);
            out[staged.len()..staged.len() + header_buf.len()].copy_from_slice(&header_buf);
            out[staged.len() + header_buf.len()..rohc_len].copy_from_slice(payload);
            self.feedback.remove_locked();
            CompressOutcome::Packet(rohc_len)
        } else {
            // Too large for the caller's buffer; segmentation may help. The
            // MRRU bound includes the FCS-32 that protects the unit.
            let rru_len = header_buf.len() + payload.len() + FCS32_LEN;
            if self.mrru == 0 || rru_len > self.mrru {
                log::warn!(
                    "ROHC packet cannot be segmented: too large ({} bytes) for MRRU ({} bytes)",
                    rru_len,
                    self.mrru
                );
                self.destroy_if_unused(cid);
                self.feedback.unlock();
                return Err(CompressionError::PacketTooLarge {
                    packet_len: rohc_len,
                    available: out.len(),
                    mrru: self.mrru,
                }
                .into());
            }
            self.segmenter.store(&header_buf, payload, &self.crc);
            // Feedback re-attaches to the first emitted segment.
            self.feedback.unlock();
            CompressOutcome::NeedsSegmentation
        };

        // Compressor and context statistics.
        let compressed_size = match outcome {
            CompressOutcome::Packet(len) => len,
            CompressOutcome::NeedsSegmentation => feedbacks_size + header_buf.len(),
        };
        self.num_packets += 1;
        self.total_uncompressed_size += headers.total_length as u64;
        self.total_compressed_size += compressed_size as u64;
        self.last_cid = Some(cid);

        if let Some(context) = self.contexts.get_mut(cid) {
            context.packet_type = encoded.packet_type;
            let stats = &mut context.stats;
            stats.num_sent_packets += 1;
            stats.total_uncompressed_size += headers.total_length as u64;
            stats.total_compressed_size += compressed_size as u64;
            stats.header_uncompressed_size += encoded.payload_offset as u64;
            stats.header_compressed_size += header_buf.len() as u64;
            stats.last_uncompressed_size = headers.total_length;
            stats.last_compressed_size = compressed_size;
            stats.last_header_uncompressed_size = encoded.payload_offset;
            stats.last_header_compressed_size = header_buf.len();
            stats.total_16_uncompressed.add(headers.total_length as u32);
            stats.total_16_compressed.add(compressed_size as u32);
            stats.header_16_uncompressed.add(encoded.payload_offset as u32);
            stats.header_16_compressed.add(header_buf.len() as u32);
        }

        Ok(outcome)
    }

    fn find_or_create_context(
        &mut self,
        handler: &'static dyn ProfileHandler,
        key: crate::types::ContextKey,
        packet: &[u8],
        headers: &PacketHeaders,
        arrival_time: Option<Instant>,
    ) -> Result<ContextId, RohcError> {
        let cid = match self.contexts.find(handler, key, packet, headers) {
            Some(cid) => cid,
            None => {
                let params = ContextParams {
                    wlsb_width: self.wlsb_width,
                    initial_sn: (self.random_fn)(),
                };
                let data = handler.create_context(packet, headers, &params)?;
                self.contexts
                    .create(handler.profile_id(), key, data, arrival_time)?
            }
        };
        self.contexts.touch(cid, arrival_time);
        Ok(cid)
    }

    /// Destroys a context that never successfully compressed a packet.
    fn destroy_if_unused(&mut self, cid: ContextId) {
        if let Some(context) = self.contexts.get(cid) {
            if context.stats.num_sent_packets == 0 {
                self.contexts.destroy(cid);
            }
        }
    }

    /// Retrieves the next segment of a staged oversized packet.
    ///
    /// Pending feedback is prepended to the segment and consumed. Returns
    /// the bytes written and whether this was the final segment.
    ///
    /// # Errors
    /// - [`CompressionError::NoRruAvailable`] - nothing staged.
    /// - [`CompressionError::PacketTooLarge`] - `out` cannot hold the
    ///   segment type octet plus one data byte.
    pub fn get_segment(&mut self, out: &mut [u8]) -> Result<SegmentOutput, RohcError> {
        if !self.segmenter.has_rru() {
            return Err(CompressionError::NoRruAvailable.into());
        }

        let mut staged = Vec::with_capacity(out.len().min(256));
        self.feedback.drain_into(&mut staged, out.len().saturating_sub(2));
        let budget = out.len() - staged.len();
        let status = match self.segmenter.next_segment(&mut staged, budget) {
            Ok(status) => status,
            Err(err) => {
                self.feedback.unlock();
                return Err(err.into());
            }
        };

        out[..staged.len()].copy_from_slice(&staged);
        self.feedback.remove_locked();
        Ok(SegmentOutput {
            len: staged.len(),
            is_final: status == SegmentStatus::Final,
        })
    }

    /// Queues feedback bytes for piggybacking on the next packet.
    pub fn piggyback_feedback(&mut self, feedback: &[u8]) -> Result<(), RohcError> {
        Ok(self.feedback.piggyback(feedback)?)
    }

    /// Delivers a feedback packet received from the remote decompressor to
    /// the context it concerns.
    ///
    /// Malformed CIDs and unknown contexts are dropped with a warning and
    /// reported as success; the channel must not fail over stray feedback.
    pub fn deliver_feedback(&mut self, data: &[u8]) -> Result<(), RohcError> {
        if data.is_empty() {
            return Err(RohcParsingError::NotEnoughData {
                needed: 1,
                got: 0,
                context: ParseContext::FeedbackPacket,
            }
            .into());
        }
        let info = match FeedbackInfo::parse(data, self.cid_type) {
            Ok(info) => info,
            Err(err) => {
                log::warn!("failed to decode feedback packet, dropping it: {}", err);
                return Ok(());
            }
        };
        let Some(context) = self.contexts.get_mut(info.cid) else {
            log::warn!("feedback for unknown context (CID = {})", info.cid);
            return Ok(());
        };
        context.stats.num_recv_feedbacks += 1;
        let profile = context.profile;
        if let Some(handler) = handler_for(profile) {
            handler.handle_feedback(context, &info);
        }
        Ok(())
    }

    /// Builds a feedback-only packet: drains and locks as much feedback as
    /// fits into `out`, returning the bytes written. Close the transaction
    /// with [`feedback_remove_locked`] or [`feedback_unlock`].
    ///
    /// [`feedback_remove_locked`]: Self::feedback_remove_locked
    /// [`feedback_unlock`]: Self::feedback_unlock
    pub fn feedback_flush(&mut self, out: &mut [u8]) -> usize {
        let mut staged = Vec::with_capacity(out.len());
        let len = self.feedback.drain_into(&mut staged, out.len());
        out[..len].copy_from_slice(&staged);
        len
    }

    /// Bytes of unsent feedback currently queued, prefixes included.
    pub fn feedback_avail_bytes(&self) -> usize {
        self.feedback.avail_bytes()
    }

    /// Commits the running feedback transaction: locked entries are freed.
    pub fn feedback_remove_locked(&mut self) {
        self.feedback.remove_locked();
    }

    /// Rolls back the running feedback transaction: locked entries will be
    /// offered again.
    pub fn feedback_unlock(&mut self) {
        self.feedback.unlock();
    }

    /// Forces every context back to IR, e.g. after link re-establishment.
    pub fn force_contexts_reinit(&mut self) {
        log::info!(
            "force re-initialization for all {} contexts",
            self.contexts.num_used()
        );
        for context in self.contexts.iter_mut() {
            if let Some(handler) = handler_for(context.profile) {
                handler.reinit_context(context);
            }
        }
    }

    /// The configured MRRU in bytes (0 = segmentation disabled).
    pub fn mrru(&self) -> usize {
        self.mrru
    }

    /// The configured MAX_CID.
    pub fn max_cid(&self) -> ContextId {
        self.max_cid
    }

    /// The CID type of this channel.
    pub fn cid_type(&self) -> CidType {
        self.cid_type
    }

    /// Number of contexts currently in use.
    pub fn contexts_used(&self) -> usize {
        self.contexts.num_used()
    }

    /// Aggregate counters of this compressor.
    pub fn general_info(&self) -> GeneralInfo {
        GeneralInfo {
            contexts_nr: self.contexts.num_used(),
            packets_nr: self.num_packets,
            uncomp_bytes_nr: self.total_uncompressed_size,
            comp_bytes_nr: self.total_compressed_size,
        }
    }

    /// Details of the last compressed packet, if any.
    pub fn last_packet_info(&self) -> Option<LastPacketInfo> {
        let cid = self.last_cid?;
        let context = self.contexts.get(cid)?;
        Some(LastPacketInfo {
            context_id: cid,
            is_context_init: context.stats.num_sent_packets == 1,
            context_mode: context.mode,
            context_state: context.state,
            profile: context.profile,
            packet_type: context.packet_type,
            total_last_uncomp_size: context.stats.last_uncompressed_size,
            header_last_uncomp_size: context.stats.last_header_uncompressed_size,
            total_last_comp_size: context.stats.last_compressed_size,
            header_last_comp_size: context.stats.last_header_compressed_size,
        })
    }

    /// Textual description of a compressor state.
    pub fn state_descr(state: ContextState) -> &'static str {
        state.descr()
    }

    /// Read access to a context, mainly for tests and diagnostics.
    pub fn context(&self, cid: ContextId) -> Option<&crate::context::CompressorContext> {
        self.contexts.get(cid)
    }
}
