//! RTP/UDP/IP compression profile (0x0001, RFC 3095 §5.7).
//!
//! RTP streams are detected among UDP packets either by a user callback or
//! by a list of dedicated UDP destination ports, plus an RTP version
//! check. The profile takes its SN from the RTP header, learns the
//! timestamp stride to switch to scaled-TS encoding, and extends the
//! packet-type decision with the UO-1-TS / UO-1-ID and UOR-2-TS /
//! UOR-2-ID formats.

use crate::constants::{IP_PROTOCOL_UDP, RTP_VERSION, UDP_HEADER_LENGTH};
use crate::context::{CompressorContext, ContextState, ProfileContext};
use crate::error::{ParseContext, RohcBuildingError, RohcError};
use crate::feedback::{FeedbackInfo, FeedbackKind};
use crate::headers::{parse_rtp, parse_udp, PacketHeaders, RtpHeader, UdpHeader};
use crate::profiles::rfc3095::{
    self, build_ext3_ip_fields, build_uo_generic, Rfc3095Context, Rfc3095Profile, RtpContext,
    TransportContext,
};
use crate::profiles::{
    chain_compressible, ip_chain_key, ContextParams, EncodeSettings, EncodedHeader, PacketType,
    ProfileHandler, RohcProfile, SelectionContext,
};
use crate::sdvl::sdvl_encode;
use crate::types::{ContextKey, SequenceNumber};

/// Consecutive packets with a constant TS increment before scaled-TS
/// encoding activates.
const TS_STRIDE_ESTABLISHMENT_THRESHOLD: u32 = 3;

/// The RTP/UDP/IP profile.
#[derive(Debug)]
pub struct RtpProfile;

fn transport_headers<'a>(
    packet: &'a [u8],
    headers: &PacketHeaders,
) -> Option<(UdpHeader, RtpHeader)> {
    let udp = parse_udp(&packet[headers.transport_offset..], ParseContext::UdpHeader).ok()?;
    let rtp = parse_rtp(&packet[headers.transport_offset + UDP_HEADER_LENGTH..]).ok()?;
    Some((udp, rtp))
}

impl RtpProfile {
    fn rtp_ctx(ctx: &Rfc3095Context) -> Option<&RtpContext> {
        match &ctx.transport {
            TransportContext::Rtp(rtp) => Some(rtp),
            _ => None,
        }
    }

    /// Whether the outer header carries a sequential (non-random) IPv4
    /// IP-ID, which selects the T-bit UO-1/UOR-2 variants.
    fn has_sequential_ip_id(ctx: &Rfc3095Context) -> bool {
        ctx.outer_ip.v4.as_ref().map_or(false, |b| !b.rnd)
    }

    fn choose_uor2_variant(ctx: &Rfc3095Context) -> PacketType {
        if !Self::has_sequential_ip_id(ctx) {
            return PacketType::Uor2;
        }
        if !ctx.tmp.no_outer_ip_id_bits && ctx.tmp.ts_deducible {
            PacketType::Uor2Id
        } else {
            PacketType::Uor2Ts
        }
    }
}

impl Rfc3095Profile for RtpProfile {
    fn profile_id(&self) -> RohcProfile {
        RohcProfile::Rtp
    }

    fn next_sn(
        &self,
        ctx: &Rfc3095Context,
        packet: &[u8],
        headers: &PacketHeaders,
    ) -> SequenceNumber {
        transport_headers(packet, headers)
            .map(|(_, rtp)| SequenceNumber::new(rtp.sequence))
            .unwrap_or(ctx.sn + 1)
    }

    fn compressed_header_len(
        &self,
        packet: &[u8],
        headers: &PacketHeaders,
    ) -> Result<usize, RohcError> {
        let rtp = parse_rtp(&packet[headers.transport_offset + UDP_HEADER_LENGTH..])?;
        Ok(headers.transport_offset + UDP_HEADER_LENGTH + rtp.header_length())
    }

    fn detect_transport_changes(
        &self,
        ctx: &mut Rfc3095Context,
        packet: &[u8],
        headers: &PacketHeaders,
    ) {
        let Some((_, rtp)) = transport_headers(packet, headers) else {
            return;
        };
        let sn_delta = ctx.tmp.new_sn - ctx.sn;
        let TransportContext::Rtp(rtp_ctx) = &mut ctx.transport else {
            return;
        };

        ctx.tmp.marker_changed = rtp.marker != rtp_ctx.last.marker;
        if rtp.payload_type != rtp_ctx.last.payload_type {
            ctx.tmp.send_dynamic += 1;
        }

        // TS stride detection, before the context is updated with this
        // packet's timestamp.
        let ts_diff = rtp.timestamp.wrapping_sub(rtp_ctx.last.timestamp);
        match rtp_ctx.ts_stride {
            None if ts_diff > 0 => {
                rtp_ctx.ts_stride = Some(ts_diff);
                rtp_ctx.ts_offset = rtp_ctx.last.timestamp;
                rtp_ctx.ts_stride_packets = 1;
            }
            Some(stride) if stride > 0 && ts_diff > 0 && ts_diff % stride == 0 => {
                rtp_ctx.ts_stride_packets = rtp_ctx.ts_stride_packets.saturating_add(1);
                if !rtp_ctx.ts_scaled_mode
                    && rtp_ctx.ts_stride_packets >= TS_STRIDE_ESTABLISHMENT_THRESHOLD
                {
                    rtp_ctx.ts_scaled_mode = true;
                    // Scaled values live in another domain than raw ones.
                    rtp_ctx.ts_window.clear();
                }
            }
            Some(_) if ts_diff != 0 => {
                // Stride broken: restart detection from this packet.
                rtp_ctx.ts_stride = if ts_diff > 0 { Some(ts_diff) } else { None };
                rtp_ctx.ts_offset = rtp_ctx.last.timestamp;
                rtp_ctx.ts_stride_packets = u32::from(ts_diff > 0);
                rtp_ctx.ts_scaled_mode = false;
                rtp_ctx.ts_window.clear();
            }
            _ => {}
        }

        let stride = rtp_ctx.ts_stride.unwrap_or(0);
        // Unchanged TS reconstructs as-is; otherwise the decompressor can
        // infer it only while scaled mode holds and TS tracks the SN.
        ctx.tmp.ts_deducible = ts_diff == 0
            || (rtp_ctx.ts_scaled_mode
                && stride > 0
                && ts_diff == stride.wrapping_mul(u32::from(sn_delta)));
        ctx.tmp.ts_to_send = if rtp_ctx.ts_scaled_mode && stride > 0 {
            rtp.timestamp.wrapping_sub(rtp_ctx.ts_offset) / stride
        } else {
            rtp.timestamp
        };
        ctx.tmp.ts_bits = if rtp_ctx.ts_window.is_empty() {
            32
        } else {
            rtp_ctx.ts_window.k_required(u64::from(ctx.tmp.ts_to_send))
        };
    }

    fn decide_fo_packet(&self, ctx: &Rfc3095Context) -> PacketType {
        if ctx.tmp.sid_unconverged {
            PacketType::IrDyn
        } else if ctx.ip_header_count() == 1 && ctx.tmp.send_dynamic > 2 {
            PacketType::IrDyn
        } else if ctx.ip_header_count() > 1 && ctx.tmp.send_dynamic > 4 {
            PacketType::IrDyn
        } else if ctx.tmp.sn_5bits_possible || ctx.tmp.sn_13bits_possible {
            Self::choose_uor2_variant(ctx)
        } else {
            PacketType::IrDyn
        }
    }

    fn decide_so_packet(&self, ctx: &Rfc3095Context) -> PacketType {
        let no_ip_id_bits = ctx.tmp.no_outer_ip_id_bits && ctx.tmp.no_inner_ip_id_bits;
        let plain_marker = !ctx.tmp.marker_changed;
        let sequential_id = Self::has_sequential_ip_id(ctx);

        if ctx.tmp.sn_4bits_possible && ctx.tmp.ts_deducible && plain_marker && no_ip_id_bits {
            PacketType::Uo0
        } else if !sequential_id && ctx.tmp.sn_4bits_possible && ctx.tmp.ts_bits <= 6 {
            PacketType::Uo1
        } else if sequential_id
            && ctx.tmp.sn_4bits_possible
            && no_ip_id_bits
            && ctx.tmp.ts_bits <= 5
        {
            PacketType::Uo1Ts
        } else if sequential_id
            && ctx.tmp.sn_4bits_possible
            && ctx.tmp.outer_ip_id_bits <= 5
            && ctx.tmp.ts_deducible
            && plain_marker
        {
            PacketType::Uo1Id
        } else if ctx.tmp.sn_5bits_possible || ctx.tmp.sn_13bits_possible {
            Self::choose_uor2_variant(ctx)
        } else {
            PacketType::IrDyn
        }
    }

    fn static_chain_transport(&self, ctx: &Rfc3095Context, out: &mut Vec<u8>) {
        if let Some(rtp) = Self::rtp_ctx(ctx) {
            out.extend_from_slice(&rtp.udp.source_port.to_be_bytes());
            out.extend_from_slice(&rtp.udp.destination_port.to_be_bytes());
            out.extend_from_slice(&rtp.ssrc.to_be_bytes());
        }
    }

    fn dynamic_chain_transport(&self, ctx: &Rfc3095Context, out: &mut Vec<u8>) {
        let Some(rtp) = Self::rtp_ctx(ctx) else {
            return;
        };
        out.extend_from_slice(&rtp.udp.checksum.to_be_bytes());
        let header = &rtp.last;
        out.push((RTP_VERSION << 6) | (u8::from(header.padding) << 5) | header.csrc_count);
        out.push((u8::from(header.marker) << 7) | header.payload_type);
        out.extend_from_slice(&ctx.tmp.new_sn.to_be_bytes());
        out.extend_from_slice(&header.timestamp.to_be_bytes());
        // Flags octet: TSS announces a generic TS stride field.
        if let Some(stride) = rtp.ts_stride.filter(|_| rtp.ts_scaled_mode) {
            out.push(0x01);
            let _ = sdvl_encode(stride & crate::sdvl::SDVL_MAX_VALUE, out);
        } else {
            out.push(0x00);
        }
    }

    fn ir_remainder(&self, _ctx: &Rfc3095Context, _out: &mut Vec<u8>) {
        // The RTP SN travels in the dynamic chain, not the IR remainder.
    }

    fn build_uo(
        &self,
        ctx: &Rfc3095Context,
        packet_type: PacketType,
        crc3: u8,
        crc7: u8,
        core: &mut Vec<u8>,
    ) -> Result<(), RohcBuildingError> {
        let sn = ctx.tmp.new_sn.value();
        // The marker to transmit is the current packet's value.
        let marker = Self::rtp_ctx(ctx)
            .map(|r| r.last.marker ^ ctx.tmp.marker_changed)
            .unwrap_or(false);
        let ts = ctx.tmp.ts_to_send;

        match packet_type {
            PacketType::Uo0 => {
                core.push(((sn as u8 & 0x0F) << 3) | (crc3 & 0x07));
            }
            PacketType::Uo1 => {
                core.push(0b1000_0000 | (ts as u8 & 0x3F));
                core.push((u8::from(marker) << 7) | ((sn as u8 & 0x0F) << 3) | (crc3 & 0x07));
            }
            PacketType::Uo1Ts => {
                core.push(0b1010_0000 | (ts as u8 & 0x1F));
                core.push((u8::from(marker) << 7) | ((sn as u8 & 0x0F) << 3) | (crc3 & 0x07));
            }
            PacketType::Uo1Id => {
                core.push(0b1000_0000 | (ctx.tmp.outer_ip_id_offset as u8 & 0x1F));
                core.push(((sn as u8 & 0x0F) << 3) | (crc3 & 0x07));
            }
            PacketType::Uor2 | PacketType::Uor2Ts | PacketType::Uor2Id => {
                let needs_ext3 = ctx.tmp.sn_bits > 6
                    || ctx.tmp.send_dynamic > 0
                    || (!ctx.tmp.ts_deducible && ctx.tmp.ts_bits > 6);
                match packet_type {
                    PacketType::Uor2 => {
                        core.push(0b1100_0000 | ((ts >> 1) as u8 & 0x1F));
                        core.push(
                            (((ts & 0x01) as u8) << 7)
                                | (u8::from(marker) << 6)
                                | (sn as u8 & 0x3F),
                        );
                    }
                    PacketType::Uor2Ts => {
                        core.push(0b1100_0000 | (ts as u8 & 0x1F));
                        core.push(0b1000_0000 | (u8::from(marker) << 6) | (sn as u8 & 0x3F));
                    }
                    _ => {
                        core.push(0b1100_0000 | (ctx.tmp.outer_ip_id_offset as u8 & 0x1F));
                        core.push((u8::from(marker) << 6) | (sn as u8 & 0x3F));
                    }
                }
                core.push((u8::from(needs_ext3) << 7) | (crc7 & 0x7F));
                if needs_ext3 {
                    build_rtp_extension3(ctx, marker, core);
                }
            }
            other => return build_uo_generic(ctx, other, crc3, crc7, core),
        }
        Ok(())
    }

    fn uo_transport_remainder(
        &self,
        ctx: &Rfc3095Context,
        packet: &[u8],
        headers: &PacketHeaders,
        out: &mut Vec<u8>,
    ) {
        let enabled =
            matches!(&ctx.transport, TransportContext::Rtp(r) if r.udp.checksum != 0);
        if enabled {
            if let Ok(udp) = parse_udp(&packet[headers.transport_offset..], ParseContext::UdpHeader)
            {
                out.extend_from_slice(&udp.checksum.to_be_bytes());
            }
        }
    }

    fn update_transport(&self, ctx: &mut Rfc3095Context, packet: &[u8], headers: &PacketHeaders) {
        let Some((udp, rtp)) = transport_headers(packet, headers) else {
            return;
        };
        let ts_to_send = ctx.tmp.ts_to_send;
        if let TransportContext::Rtp(rtp_ctx) = &mut ctx.transport {
            rtp_ctx.udp = udp;
            rtp_ctx.last = rtp;
            rtp_ctx.ts_window.add(u64::from(ts_to_send));
        }
    }
}

/// Extension 3, RTP flavor (RFC 3095 §5.7.5): flags `11 S R-TS Tsc I ip
/// rtp`, then the announced fields.
fn build_rtp_extension3(ctx: &Rfc3095Context, marker: bool, out: &mut Vec<u8>) {
    let send_sn = ctx.tmp.sn_bits > 6;
    let send_ts = !ctx.tmp.ts_deducible && ctx.tmp.ts_bits > 6;
    let ts_scaled = matches!(&ctx.transport, TransportContext::Rtp(r) if r.ts_scaled_mode);
    let send_ip_id = !ctx.tmp.no_outer_ip_id_bits;
    let ip_fields = ctx.tmp.send_dynamic > 0;
    let rtp_flags = ctx.tmp.marker_changed || ctx.tmp.send_dynamic > 0;

    let mut flags = 0b1100_0000;
    if send_sn {
        flags |= 0b0010_0000;
    }
    if send_ts {
        flags |= 0b0001_0000;
    }
    if ts_scaled {
        flags |= 0b0000_1000;
    }
    if send_ip_id {
        flags |= 0b0000_0100;
    }
    if ip_fields {
        flags |= 0b0000_0010;
    }
    if rtp_flags {
        flags |= 0b0000_0001;
    }
    out.push(flags);

    if ip_fields {
        let innermost = ctx.inner_ip.as_ref().unwrap_or(&ctx.outer_ip);
        build_ext3_ip_fields(innermost, out);
    }
    if send_sn {
        out.push((ctx.tmp.new_sn.value() >> 6) as u8);
    }
    if send_ts {
        let _ = sdvl_encode(ctx.tmp.ts_to_send & crate::sdvl::SDVL_MAX_VALUE, out);
    }
    if send_ip_id {
        out.extend_from_slice(&ctx.tmp.outer_ip_id_offset.to_be_bytes());
    }
    if rtp_flags {
        let pt = match &ctx.transport {
            TransportContext::Rtp(r) => r.last.payload_type,
            _ => 0,
        };
        out.push((u8::from(marker) << 7) | (pt & 0x7F));
    }
}

impl ProfileHandler for RtpProfile {
    fn profile_id(&self) -> RohcProfile {
        RohcProfile::Rtp
    }

    fn description(&self) -> &'static str {
        "RTP / Compressor"
    }

    fn accepts(
        &self,
        packet: &[u8],
        headers: &PacketHeaders,
        selection: &SelectionContext<'_>,
    ) -> Option<ContextKey> {
        if headers.next_protocol != IP_PROTOCOL_UDP || !chain_compressible(headers) {
            return None;
        }
        let (udp, rtp) = transport_headers(packet, headers)?;
        if rtp.version != RTP_VERSION {
            return None;
        }

        let is_rtp = match selection.rtp_detector {
            Some(detector) => {
                let udp_payload = &packet[headers.transport_offset + UDP_HEADER_LENGTH..];
                detector(headers, &udp, udp_payload)
            }
            None => selection.rtp_ports.contains(&udp.destination_port),
        };
        if !is_rtp {
            return None;
        }

        Some(
            ip_chain_key(headers)
                .mix_u16(udp.source_port)
                .mix_u16(udp.destination_port)
                .mix_u32(rtp.ssrc),
        )
    }

    fn create_context(
        &self,
        packet: &[u8],
        headers: &PacketHeaders,
        params: &ContextParams,
    ) -> Result<ProfileContext, RohcError> {
        let udp = parse_udp(&packet[headers.transport_offset..], ParseContext::UdpHeader)?;
        let rtp = parse_rtp(&packet[headers.transport_offset + UDP_HEADER_LENGTH..])?;
        let initial_sn = rtp.sequence;
        let p_ts = (params.wlsb_width / 2) as i64 - 1;
        Ok(ProfileContext::Rfc3095(Box::new(Rfc3095Context::new(
            headers,
            TransportContext::Rtp(RtpContext::new(udp, rtp, params.wlsb_width, p_ts)),
            params.wlsb_width,
            initial_sn,
        ))))
    }

    fn matches_context(
        &self,
        context: &ProfileContext,
        packet: &[u8],
        headers: &PacketHeaders,
    ) -> bool {
        let Some(ctx) = context.rfc3095() else {
            return false;
        };
        if !rfc3095::same_chain_statics(ctx, headers) {
            return false;
        }
        let Some((udp, rtp)) = transport_headers(packet, headers) else {
            return false;
        };
        matches!(&ctx.transport, TransportContext::Rtp(last)
            if last.udp.source_port == udp.source_port
                && last.udp.destination_port == udp.destination_port
                && last.ssrc == rtp.ssrc)
    }

    fn encode(
        &self,
        context: &mut CompressorContext,
        packet: &[u8],
        headers: &PacketHeaders,
        settings: &EncodeSettings<'_>,
        out: &mut Vec<u8>,
    ) -> Result<EncodedHeader, RohcError> {
        rfc3095::encode(self, context, packet, headers, settings, out)
    }

    fn reinit_context(&self, context: &mut CompressorContext) {
        context.state = ContextState::Ir;
        if let Some(ctx) = context.data.rfc3095_mut() {
            ctx.reinit();
        }
    }

    fn handle_feedback(&self, context: &mut CompressorContext, info: &FeedbackInfo) {
        if matches!(info.kind, FeedbackKind::Nack | FeedbackKind::StaticNack) {
            self.reinit_context(context);
        }
    }

    fn uses_udp_port(&self, context: &ProfileContext, port: u16) -> bool {
        context.rfc3095().map_or(false, |ctx| {
            matches!(&ctx.transport, TransportContext::Rtp(rtp)
                if rtp.udp.source_port == port || rtp.udp.destination_port == port)
        })
    }
}
