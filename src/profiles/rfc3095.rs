//! Generic RFC 3095 compression engine.
//!
//! Everything the IP-based profiles (IP-only, UDP, UDP-Lite, ESP, RTP)
//! share: the per-flow context block, change detection, the IR/FO/SO state
//! machine, the packet-type decision, and the IR/IR-DYN/UO-0/UO-1/UOR-2
//! builders with extensions 0 to 3. Profiles specialize through the
//! [`Rfc3095Profile`] trait: their SN source, transport chain parts, and
//! packet-type policy overrides plug into [`encode`].

use crate::constants::{
    IR_DYN_PACKET_TYPE, IR_PACKET_TYPE_BASE, MAX_FO_COUNT, MAX_IR_COUNT, OA_REPETITIONS,
    P_OFFSET_IP_ID, P_OFFSET_SN,
};
use crate::context::{CompressorContext, ContextState};
use crate::encodings::WlsbWindow;
use crate::error::{RohcBuildingError, RohcError};
use crate::headers::{EspHeader, IpHeader, PacketHeaders, RtpHeader, UdpHeader};
use crate::profiles::{EncodeSettings, EncodedHeader, PacketType, RohcProfile};
use crate::sdvl::sdvl_encode;
use crate::types::{CidType, ContextId, IpId, SequenceNumber};

/// IP-ID delta accepted as "sequential" when classifying IPv4 behavior.
const IP_ID_MAX_DELTA: u16 = 20;

/// Behavior of one IPv4 header's Identification field, learned over time.
#[derive(Debug, Clone)]
pub struct V4Behavior {
    pub last_ip_id: IpId,
    /// Window over the offset `IP-ID - SN` (offset IP-ID encoding).
    pub ip_id_window: WlsbWindow,
    /// IP-ID is random; it is sent uncompressed when needed.
    pub rnd: bool,
    /// IP-ID increments in network byte order.
    pub nbo: bool,
    /// IP-ID is static (constant between packets).
    pub sid: bool,
    /// Consecutive packets since each property stabilized.
    pub rnd_count: u32,
    pub nbo_count: u32,
    pub sid_count: u32,
}

impl V4Behavior {
    fn new(ip_id: IpId, wlsb_width: usize) -> Self {
        Self {
            last_ip_id: ip_id,
            ip_id_window: WlsbWindow::new(wlsb_width, 16, P_OFFSET_IP_ID),
            rnd: false,
            nbo: true,
            sid: false,
            rnd_count: 0,
            nbo_count: 0,
            sid_count: 0,
        }
    }

    /// All three properties observed often enough to be trusted.
    fn oa_converged(&self) -> bool {
        self.rnd_count >= OA_REPETITIONS
            && self.nbo_count >= OA_REPETITIONS
            && self.sid_count >= OA_REPETITIONS
    }
}

/// Compression state of one IP header in the chain.
#[derive(Debug, Clone)]
pub struct IpHeaderContext {
    /// The header as last transmitted.
    pub last: IpHeader,
    /// IPv4 Identification behavior; `None` for IPv6.
    pub v4: Option<V4Behavior>,
}

impl IpHeaderContext {
    fn new(header: &IpHeader, wlsb_width: usize) -> Self {
        let v4 = header
            .as_v4()
            .map(|h| V4Behavior::new(h.identification, wlsb_width));
        Self {
            last: header.clone(),
            v4,
        }
    }
}

/// RTP-specific part of the generic context.
#[derive(Debug, Clone)]
pub struct RtpContext {
    pub udp: UdpHeader,
    pub ssrc: u32,
    pub last: RtpHeader,
    /// Window over the transmitted TS values (scaled once a stride holds).
    pub ts_window: WlsbWindow,
    pub ts_stride: Option<u32>,
    pub ts_offset: u32,
    pub ts_stride_packets: u32,
    pub ts_scaled_mode: bool,
}

impl RtpContext {
    pub fn new(udp: UdpHeader, rtp: RtpHeader, wlsb_width: usize, p_ts: i64) -> Self {
        Self {
            udp,
            ssrc: rtp.ssrc,
            last: rtp,
            ts_window: WlsbWindow::new(wlsb_width, 32, p_ts),
            ts_stride: None,
            ts_offset: 0,
            ts_stride_packets: 0,
            ts_scaled_mode: false,
        }
    }
}

/// Transport block carried next to the IP chain, per profile.
#[derive(Debug, Clone)]
pub enum TransportContext {
    /// IP-only: nothing beyond the IP chain.
    None,
    Udp(UdpHeader),
    UdpLite(UdpHeader),
    Esp(EspHeader),
    Rtp(RtpContext),
}

/// Per-packet scratch recomputed on every encode.
#[derive(Debug, Clone, Default)]
pub struct Scratch {
    pub new_sn: SequenceNumber,
    pub sn_bits: u8,
    pub sn_4bits_possible: bool,
    pub sn_5bits_possible: bool,
    pub sn_13bits_possible: bool,
    /// Bits of outer IP-ID offset to transmit (0 when none required).
    pub outer_ip_id_bits: u8,
    pub inner_ip_id_bits: u8,
    /// Offset `IP-ID - SN` of this packet, per header (0 for IPv6).
    pub outer_ip_id_offset: u16,
    pub inner_ip_id_offset: u16,
    pub no_outer_ip_id_bits: bool,
    pub outer_ip_id_6bits_possible: bool,
    pub no_inner_ip_id_bits: bool,
    /// Count of changed static fields.
    pub send_static: usize,
    /// Count of changed dynamic fields.
    pub send_dynamic: usize,
    /// A change requires full context resynchronization.
    pub static_resync: bool,
    /// Some IPv4 header's SID property is not yet trusted.
    pub sid_unconverged: bool,
    // RTP-only scratch, unset for the other profiles.
    pub ts_deducible: bool,
    pub ts_bits: u8,
    /// TS value whose LSBs go on the wire (scaled once a stride holds).
    pub ts_to_send: u32,
    pub marker_changed: bool,
}

/// The profile-agnostic RFC 3095 block of a compression context.
#[derive(Debug, Clone)]
pub struct Rfc3095Context {
    /// 16-bit wrapping sequence number (random initial value, §5.11.1).
    pub sn: SequenceNumber,
    pub sn_window: WlsbWindow,
    pub outer_ip: IpHeaderContext,
    pub inner_ip: Option<IpHeaderContext>,
    /// IR packets sent since the last context (re)initialization.
    pub ir_count: u32,
    /// FO packets sent since the last IR.
    pub fo_count: u32,
    pub so_count: u32,
    /// Packets sent in FO/SO since the last IR (periodic refresh).
    pub packets_since_ir: u32,
    /// Packets sent in SO since the last FO (periodic refresh).
    pub packets_since_fo: u32,
    pub transport: TransportContext,
    pub tmp: Scratch,
}

impl Rfc3095Context {
    /// Builds the generic block from the first packet of a flow.
    pub fn new(
        headers: &PacketHeaders,
        transport: TransportContext,
        wlsb_width: usize,
        initial_sn: u16,
    ) -> Self {
        Self {
            sn: SequenceNumber::new(initial_sn),
            sn_window: WlsbWindow::new(wlsb_width, 16, P_OFFSET_SN),
            outer_ip: IpHeaderContext::new(&headers.outer, wlsb_width),
            inner_ip: headers
                .inner
                .as_ref()
                .map(|h| IpHeaderContext::new(h, wlsb_width)),
            ir_count: 0,
            fo_count: 0,
            so_count: 0,
            packets_since_ir: 0,
            packets_since_fo: 0,
            transport,
            tmp: Scratch::default(),
        }
    }

    /// Number of IP headers tracked (1 or 2).
    pub fn ip_header_count(&self) -> usize {
        if self.inner_ip.is_some() {
            2
        } else {
            1
        }
    }

    /// Drops learned state so the next packet is a full IR.
    pub fn reinit(&mut self) {
        self.ir_count = 0;
        self.fo_count = 0;
        self.so_count = 0;
        self.packets_since_ir = 0;
        self.packets_since_fo = 0;
        self.sn_window.clear();
        if let Some(v4) = self.outer_ip.v4.as_mut() {
            v4.ip_id_window.clear();
            v4.rnd_count = 0;
            v4.nbo_count = 0;
            v4.sid_count = 0;
        }
        if let Some(inner) = self.inner_ip.as_mut() {
            if let Some(v4) = inner.v4.as_mut() {
                v4.ip_id_window.clear();
                v4.rnd_count = 0;
                v4.nbo_count = 0;
                v4.sid_count = 0;
            }
        }
        if let TransportContext::Rtp(rtp) = &mut self.transport {
            rtp.ts_window.clear();
            rtp.ts_stride = None;
            rtp.ts_stride_packets = 0;
            rtp.ts_scaled_mode = false;
        }
    }
}

/// Profile-specific behavior plugged into the generic [`encode`].
pub trait Rfc3095Profile: Sync {
    fn profile_id(&self) -> RohcProfile;

    /// SN candidate for the packet being compressed.
    fn next_sn(&self, ctx: &Rfc3095Context, packet: &[u8], headers: &PacketHeaders)
        -> SequenceNumber;

    /// Bytes of the original packet the compressed header replaces.
    fn compressed_header_len(&self, packet: &[u8], headers: &PacketHeaders)
        -> Result<usize, RohcError>;

    /// Detects transport-level changes into `ctx.tmp` (RTP overrides this).
    fn detect_transport_changes(
        &self,
        ctx: &mut Rfc3095Context,
        packet: &[u8],
        headers: &PacketHeaders,
    ) {
        let _ = (ctx, packet, headers);
    }

    /// FO-state packet choice; the generic policy fits the non-RTP profiles.
    fn decide_fo_packet(&self, ctx: &Rfc3095Context) -> PacketType {
        decide_fo_generic(ctx)
    }

    /// SO-state packet choice.
    fn decide_so_packet(&self, ctx: &Rfc3095Context) -> PacketType {
        decide_so_generic(ctx)
    }

    /// Transport part of the IR static chain.
    fn static_chain_transport(&self, ctx: &Rfc3095Context, out: &mut Vec<u8>);

    /// Transport part of the IR/IR-DYN dynamic chain.
    fn dynamic_chain_transport(&self, ctx: &Rfc3095Context, out: &mut Vec<u8>);

    /// Remainder after the chains: 16-bit SN for the non-RTP IP profiles.
    fn ir_remainder(&self, ctx: &Rfc3095Context, out: &mut Vec<u8>) {
        out.extend_from_slice(&ctx.tmp.new_sn.to_be_bytes());
    }

    /// Builds a UO-family packet into `core`. The generic builder covers
    /// UO-0 / UO-1 / UOR-2 with extensions 0-3; RTP replaces it.
    fn build_uo(
        &self,
        ctx: &Rfc3095Context,
        packet_type: PacketType,
        crc3: u8,
        crc7: u8,
        core: &mut Vec<u8>,
    ) -> Result<(), RohcBuildingError> {
        build_uo_generic(ctx, packet_type, crc3, crc7, core)
    }

    /// Transport fields appended verbatim after a UO base header and its
    /// extension: typically the UDP checksum while it is in use
    /// (RFC 3095 §5.7.7.5). Random IP-IDs are appended by the engine.
    fn uo_transport_remainder(
        &self,
        ctx: &Rfc3095Context,
        packet: &[u8],
        headers: &PacketHeaders,
        out: &mut Vec<u8>,
    ) {
        let _ = (ctx, packet, headers, out);
    }

    /// Commits transport state after a successful encode.
    fn update_transport(&self, ctx: &mut Rfc3095Context, packet: &[u8], headers: &PacketHeaders) {
        let _ = (ctx, packet, headers);
    }
}

/// Compresses one packet with the generic RFC 3095 machinery.
///
/// Fills the per-packet scratch, drives the state machine, selects the
/// packet type, builds the ROHC header into `out`, and commits the context
/// updates.
pub fn encode<P: Rfc3095Profile + ?Sized>(
    profile: &P,
    context: &mut CompressorContext,
    packet: &[u8],
    headers: &PacketHeaders,
    settings: &EncodeSettings<'_>,
    out: &mut Vec<u8>,
) -> Result<EncodedHeader, RohcError> {
    let payload_offset = profile.compressed_header_len(packet, headers)?;
    if payload_offset > headers.total_length {
        return Err(crate::error::RohcParsingError::TruncatedPacket {
            declared: headers.total_length,
            available: payload_offset,
        }
        .into());
    }
    let state = context.state;
    let ctx = context
        .data
        .rfc3095_mut()
        .ok_or(RohcBuildingError::ContextInsufficient {
            reason: "profile requires an RFC 3095 context block",
        })?;

    ctx.tmp = Scratch::default();
    ctx.tmp.new_sn = profile.next_sn(ctx, packet, headers);

    detect_ip_changes(ctx, headers);
    detect_ip_id_behaviors(ctx, headers);
    compute_bit_requirements(ctx, headers);
    profile.detect_transport_changes(ctx, packet, headers);

    let new_state = decide_state(state, ctx, settings);
    let packet_type = match new_state {
        ContextState::Ir => PacketType::Ir,
        ContextState::Fo => profile.decide_fo_packet(ctx),
        ContextState::So => profile.decide_so_packet(ctx),
    };
    log::debug!(
        "CID {}: state {} -> {}, packet type {}",
        settings.cid,
        state.descr(),
        new_state.descr(),
        packet_type.descr()
    );

    // The CRC of every emitted packet protects the original uncompressed
    // header, whatever the packet family.
    let original_header = &packet[..payload_offset];
    let mut core = Vec::with_capacity(64);
    match packet_type {
        PacketType::Ir => {
            let crc8 = settings.crc.crc8(original_header);
            build_ir(profile, ctx, crc8, true, &mut core);
        }
        PacketType::IrDyn => {
            let crc8 = settings.crc.crc8(original_header);
            build_ir_dyn(profile, ctx, crc8, &mut core);
        }
        _ => {
            let crc3 = settings.crc.crc3(original_header);
            let crc7 = settings.crc.crc7(original_header);
            profile.build_uo(ctx, packet_type, crc3, crc7, &mut core)?;
            append_random_ip_ids(ctx, headers, &mut core);
            profile.uo_transport_remainder(ctx, packet, headers, &mut core);
        }
    }
    assemble_with_cid(settings.cid, settings.cid_type, &core, out)?;

    // Commit: windows, last-seen headers, state-machine counters.
    let sent_sn = ctx.tmp.new_sn;
    ctx.sn = sent_sn;
    ctx.sn_window.add(sent_sn.as_u64());
    commit_ip_headers(ctx, headers);
    profile.update_transport(ctx, packet, headers);

    match new_state {
        ContextState::Ir => {
            ctx.ir_count += 1;
            ctx.fo_count = 0;
            ctx.so_count = 0;
            ctx.packets_since_ir = 0;
            ctx.packets_since_fo = 0;
        }
        ContextState::Fo => {
            ctx.fo_count += 1;
            ctx.so_count = 0;
            ctx.packets_since_ir += 1;
            ctx.packets_since_fo = 0;
        }
        ContextState::So => {
            ctx.so_count += 1;
            ctx.packets_since_ir += 1;
            ctx.packets_since_fo += 1;
        }
    }
    match packet_type {
        PacketType::Ir => context.stats.num_sent_ir += 1,
        PacketType::IrDyn => context.stats.num_sent_ir_dyn += 1,
        _ => {}
    }
    context.state = new_state;

    Ok(EncodedHeader {
        packet_type,
        payload_offset,
    })
}

// --- change detection -----------------------------------------------------

/// True when the packet's IP static chain matches the context's. Used by
/// the profiles' context content match after a key hit.
pub(crate) fn same_chain_statics(ctx: &Rfc3095Context, headers: &PacketHeaders) -> bool {
    if ctx.ip_header_count() != headers.ip_header_count() {
        return false;
    }
    let (changed, resync) = ip_static_changed(&ctx.outer_ip.last, &headers.outer);
    if changed > 0 || resync {
        return false;
    }
    if let (Some(inner_ctx), Some(inner_new)) = (&ctx.inner_ip, &headers.inner) {
        let (changed, resync) = ip_static_changed(&inner_ctx.last, inner_new);
        if changed > 0 || resync {
            return false;
        }
    }
    true
}

/// Static-field comparison. Returns `(changed, resync)`: `changed` counts
/// static fields that differ, `resync` is set when the change cannot be
/// repaired by a UOR-2 extension (addresses, version switch) and demands a
/// full IR.
fn ip_static_changed(last: &IpHeader, new: &IpHeader) -> (usize, bool) {
    match (last, new) {
        (IpHeader::V4(a), IpHeader::V4(b)) => {
            let mut changed = 0;
            let mut resync = false;
            if a.source != b.source || a.destination != b.destination {
                changed += 1;
                resync = true;
            }
            if a.protocol != b.protocol {
                changed += 1;
            }
            (changed, resync)
        }
        (IpHeader::V6(a), IpHeader::V6(b)) => {
            let mut changed = 0;
            let mut resync = false;
            if a.source != b.source || a.destination != b.destination {
                changed += 1;
                resync = true;
            }
            if a.next_header != b.next_header {
                changed += 1;
            }
            if a.flow_label != b.flow_label {
                changed += 1;
            }
            (changed, resync)
        }
        // IP version switch: everything static changed.
        _ => (2, true),
    }
}

fn ip_dynamic_changed(last: &IpHeader, new: &IpHeader) -> usize {
    let mut changed = 0;
    if last.tos_or_tc() != new.tos_or_tc() {
        changed += 1;
    }
    if last.ttl_or_hop_limit() != new.ttl_or_hop_limit() {
        changed += 1;
    }
    if let (Some(a), Some(b)) = (last.as_v4(), new.as_v4()) {
        if a.dont_fragment != b.dont_fragment {
            changed += 1;
        }
    }
    changed
}

fn detect_ip_changes(ctx: &mut Rfc3095Context, headers: &PacketHeaders) {
    let (mut send_static, mut static_resync) =
        ip_static_changed(&ctx.outer_ip.last, &headers.outer);
    let mut send_dynamic = ip_dynamic_changed(&ctx.outer_ip.last, &headers.outer);

    match (&ctx.inner_ip, &headers.inner) {
        (Some(inner_ctx), Some(inner_new)) => {
            let (changed, resync) = ip_static_changed(&inner_ctx.last, inner_new);
            send_static += changed;
            static_resync |= resync;
            send_dynamic += ip_dynamic_changed(&inner_ctx.last, inner_new);
        }
        (None, None) => {}
        // The number of IP headers changed: full resynchronization.
        _ => static_resync = true,
    }

    ctx.tmp.send_static = send_static;
    ctx.tmp.send_dynamic = send_dynamic;
    ctx.tmp.static_resync = static_resync;
}

/// Classifies one IPv4 Identification observation and updates the
/// optimistic-approach counters. A property counter grows while the
/// observed property matches the stored flag and restarts when it flips.
fn update_v4_behavior(behavior: &mut V4Behavior, new_id: IpId, changed_dynamic: &mut usize) {
    let delta_nbo = new_id.value().wrapping_sub(behavior.last_ip_id.value());
    let delta_swapped = new_id
        .value()
        .swap_bytes()
        .wrapping_sub(behavior.last_ip_id.value().swap_bytes());

    let (rnd, nbo, sid) = if new_id == behavior.last_ip_id {
        (false, behavior.nbo, true)
    } else if delta_nbo > 0 && delta_nbo <= IP_ID_MAX_DELTA {
        (false, true, false)
    } else if delta_swapped > 0 && delta_swapped <= IP_ID_MAX_DELTA {
        (false, false, false)
    } else {
        (true, behavior.nbo, false)
    };

    if sid == behavior.sid {
        behavior.sid_count = behavior.sid_count.saturating_add(1);
    } else {
        behavior.sid = sid;
        behavior.sid_count = 1;
        *changed_dynamic += 1;
    }
    if rnd == behavior.rnd {
        behavior.rnd_count = behavior.rnd_count.saturating_add(1);
    } else {
        behavior.rnd = rnd;
        behavior.rnd_count = 1;
        *changed_dynamic += 1;
    }
    if nbo == behavior.nbo {
        behavior.nbo_count = behavior.nbo_count.saturating_add(1);
    } else {
        behavior.nbo = nbo;
        behavior.nbo_count = 1;
        *changed_dynamic += 1;
    }
}

fn detect_ip_id_behaviors(ctx: &mut Rfc3095Context, headers: &PacketHeaders) {
    let mut changed = 0;
    let mut sid_unconverged = false;

    if let (Some(behavior), Some(v4)) = (ctx.outer_ip.v4.as_mut(), headers.outer.as_v4()) {
        update_v4_behavior(behavior, v4.identification, &mut changed);
        sid_unconverged |= behavior.sid_count < OA_REPETITIONS;
    }
    if let (Some(inner_ctx), Some(IpHeader::V4(v4))) = (ctx.inner_ip.as_mut(), headers.inner.as_ref())
    {
        if let Some(behavior) = inner_ctx.v4.as_mut() {
            update_v4_behavior(behavior, v4.identification, &mut changed);
            sid_unconverged |= behavior.sid_count < OA_REPETITIONS;
        }
    }

    ctx.tmp.send_dynamic += changed;
    ctx.tmp.sid_unconverged = sid_unconverged;
}

fn ip_id_bits_for(behavior: &V4Behavior, new_id: IpId, new_sn: SequenceNumber) -> u8 {
    if behavior.rnd {
        // Random IP-IDs are carried uncompressed, no window bits apply.
        return 16;
    }
    let offset = ip_id_offset(behavior, new_id, new_sn);
    behavior.ip_id_window.k_required(u64::from(offset))
}

fn compute_bit_requirements(ctx: &mut Rfc3095Context, headers: &PacketHeaders) {
    let new_sn = ctx.tmp.new_sn.as_u64();
    ctx.tmp.sn_bits = ctx.sn_window.k_required(new_sn);
    ctx.tmp.sn_4bits_possible = !ctx.sn_window.is_empty() && ctx.sn_window.covered_by(new_sn, 4);
    ctx.tmp.sn_5bits_possible = !ctx.sn_window.is_empty() && ctx.sn_window.covered_by(new_sn, 5);
    ctx.tmp.sn_13bits_possible = !ctx.sn_window.is_empty() && ctx.sn_window.covered_by(new_sn, 13);

    match (&ctx.outer_ip.v4, headers.outer.as_v4()) {
        (Some(behavior), Some(v4)) => {
            let bits = ip_id_bits_for(behavior, v4.identification, ctx.tmp.new_sn);
            ctx.tmp.outer_ip_id_bits = bits;
            ctx.tmp.outer_ip_id_offset =
                ip_id_offset(behavior, v4.identification, ctx.tmp.new_sn);
            ctx.tmp.no_outer_ip_id_bits = behavior.rnd || bits == 0;
            ctx.tmp.outer_ip_id_6bits_possible = !behavior.rnd && bits <= 6;
        }
        _ => {
            ctx.tmp.outer_ip_id_bits = 0;
            ctx.tmp.outer_ip_id_offset = 0;
            ctx.tmp.no_outer_ip_id_bits = true;
            ctx.tmp.outer_ip_id_6bits_possible = false;
        }
    }

    match (
        ctx.inner_ip.as_ref().and_then(|i| i.v4.as_ref()),
        headers.inner.as_ref().and_then(|h| h.as_v4()),
    ) {
        (Some(behavior), Some(v4)) => {
            let bits = ip_id_bits_for(behavior, v4.identification, ctx.tmp.new_sn);
            ctx.tmp.inner_ip_id_bits = bits;
            ctx.tmp.inner_ip_id_offset =
                ip_id_offset(behavior, v4.identification, ctx.tmp.new_sn);
            ctx.tmp.no_inner_ip_id_bits = behavior.rnd || bits == 0;
        }
        _ => {
            ctx.tmp.inner_ip_id_bits = 0;
            ctx.tmp.inner_ip_id_offset = 0;
            ctx.tmp.no_inner_ip_id_bits = true;
        }
    }
}

/// Offset IP-ID of one observation, honoring the learned byte order.
fn ip_id_offset(behavior: &V4Behavior, new_id: IpId, new_sn: SequenceNumber) -> u16 {
    let id = if behavior.nbo {
        new_id.value()
    } else {
        new_id.value().swap_bytes()
    };
    id.wrapping_sub(new_sn.value())
}

fn commit_ip_headers(ctx: &mut Rfc3095Context, headers: &PacketHeaders) {
    let new_sn = ctx.tmp.new_sn;
    commit_one_ip(&mut ctx.outer_ip, &headers.outer, new_sn);
    if let (Some(inner_ctx), Some(inner_new)) = (ctx.inner_ip.as_mut(), headers.inner.as_ref()) {
        commit_one_ip(inner_ctx, inner_new, new_sn);
    }
}

fn commit_one_ip(ip_ctx: &mut IpHeaderContext, new: &IpHeader, new_sn: SequenceNumber) {
    if let (Some(behavior), Some(v4)) = (ip_ctx.v4.as_mut(), new.as_v4()) {
        if !behavior.rnd {
            let offset = ip_id_offset(behavior, v4.identification, new_sn);
            behavior.ip_id_window.add(u64::from(offset));
        }
        behavior.last_ip_id = v4.identification;
    }
    ip_ctx.last = new.clone();
}

// --- state machine --------------------------------------------------------

fn oa_converged(ctx: &Rfc3095Context) -> bool {
    let outer_ok = ctx.outer_ip.v4.as_ref().map_or(true, V4Behavior::oa_converged);
    let inner_ok = ctx
        .inner_ip
        .as_ref()
        .and_then(|i| i.v4.as_ref())
        .map_or(true, V4Behavior::oa_converged);
    outer_ok && inner_ok
}

fn decide_state(
    current: ContextState,
    ctx: &Rfc3095Context,
    settings: &EncodeSettings<'_>,
) -> ContextState {
    if ctx.tmp.static_resync {
        return ContextState::Ir;
    }

    let next = match current {
        ContextState::Ir => {
            if ctx.ir_count >= MAX_IR_COUNT && oa_converged(ctx) {
                ContextState::Fo
            } else {
                ContextState::Ir
            }
        }
        ContextState::Fo => {
            if ctx.fo_count >= MAX_FO_COUNT
                && ctx.tmp.send_dynamic == 0
                && oa_converged(ctx)
                && ctx.sn_window.len() as u32 >= MAX_FO_COUNT
            {
                ContextState::So
            } else {
                ContextState::Fo
            }
        }
        ContextState::So => {
            // Minimal packets cannot carry changed dynamic fields.
            if ctx.tmp.send_dynamic > 0 {
                ContextState::Fo
            } else {
                ContextState::So
            }
        }
    };

    // Periodic refreshes, counted in packets (spec defaults 1700 / 700).
    match next {
        ContextState::Ir => ContextState::Ir,
        ContextState::Fo | ContextState::So
            if ctx.packets_since_ir + 1 >= settings.ir_refresh_timeout.max(1) =>
        {
            log::debug!("periodic IR refresh after {} packets", ctx.packets_since_ir + 1);
            ContextState::Ir
        }
        ContextState::So if ctx.packets_since_fo + 1 >= settings.fo_refresh_timeout.max(1) => {
            log::debug!("periodic FO refresh after {} packets", ctx.packets_since_fo + 1);
            ContextState::Fo
        }
        other => other,
    }
}

// --- packet-type decision -------------------------------------------------

fn sn_13bits_or_less(ctx: &Rfc3095Context) -> bool {
    ctx.tmp.sn_5bits_possible || ctx.tmp.sn_13bits_possible
}

/// FO-state choice for the non-RTP profiles: IR-DYN or UOR-2.
pub fn decide_fo_generic(ctx: &Rfc3095Context) -> PacketType {
    if ctx.tmp.sid_unconverged {
        PacketType::IrDyn
    } else if ctx.tmp.send_static > 0 && sn_13bits_or_less(ctx) {
        PacketType::Uor2
    } else if ctx.ip_header_count() == 1 && ctx.tmp.send_dynamic > 2 {
        PacketType::IrDyn
    } else if ctx.ip_header_count() > 1 && ctx.tmp.send_dynamic > 4 {
        PacketType::IrDyn
    } else if sn_13bits_or_less(ctx) {
        PacketType::Uor2
    } else {
        PacketType::IrDyn
    }
}

/// SO-state choice for the non-RTP profiles: UO-0, UO-1, UOR-2 or IR-DYN.
pub fn decide_so_generic(ctx: &Rfc3095Context) -> PacketType {
    let inner_clear = ctx.tmp.no_inner_ip_id_bits;
    if ctx.tmp.sn_4bits_possible && ctx.tmp.no_outer_ip_id_bits && inner_clear {
        PacketType::Uo0
    } else if ctx.tmp.sn_5bits_possible && ctx.tmp.outer_ip_id_6bits_possible && inner_clear {
        PacketType::Uo1
    } else if sn_13bits_or_less(ctx) {
        PacketType::Uor2
    } else {
        PacketType::IrDyn
    }
}

// --- packet builders ------------------------------------------------------

/// Prefixes the core packet with CID information: an Add-CID octet for
/// small CIDs 1-15, an SDVL field after the type octet for large CIDs.
pub(crate) fn assemble_with_cid(
    cid: ContextId,
    cid_type: CidType,
    core: &[u8],
    out: &mut Vec<u8>,
) -> Result<(), RohcError> {
    match cid_type {
        CidType::Small => {
            if cid.value() > 0 {
                out.push(crate::constants::ADD_CID_PREFIX_VALUE | (cid.value() as u8 & 0x0F));
            }
            out.extend_from_slice(core);
        }
        CidType::Large => {
            out.push(core[0]);
            sdvl_encode(u32::from(cid.value()), out)?;
            out.extend_from_slice(&core[1..]);
        }
    }
    Ok(())
}

fn build_ip_static_chain(ctx: &Rfc3095Context, out: &mut Vec<u8>) {
    build_one_ip_static(&ctx.outer_ip.last, out);
    if let Some(inner) = &ctx.inner_ip {
        build_one_ip_static(&inner.last, out);
    }
}

fn build_one_ip_static(header: &IpHeader, out: &mut Vec<u8>) {
    match header {
        IpHeader::V4(h) => {
            out.push(0x40);
            out.push(h.protocol);
            out.extend_from_slice(&h.source.octets());
            out.extend_from_slice(&h.destination.octets());
        }
        IpHeader::V6(h) => {
            out.push(0x60 | ((h.flow_label >> 16) as u8 & 0x0F));
            out.push((h.flow_label >> 8) as u8);
            out.push(h.flow_label as u8);
            out.push(h.next_header);
            out.extend_from_slice(&h.source.octets());
            out.extend_from_slice(&h.destination.octets());
        }
    }
}

fn build_ip_dynamic_chain(ctx: &Rfc3095Context, out: &mut Vec<u8>) {
    build_one_ip_dynamic(&ctx.outer_ip, out);
    if let Some(inner) = &ctx.inner_ip {
        build_one_ip_dynamic(inner, out);
    }
}

fn build_one_ip_dynamic(ip_ctx: &IpHeaderContext, out: &mut Vec<u8>) {
    match &ip_ctx.last {
        IpHeader::V4(h) => {
            out.push(h.tos);
            out.push(h.ttl);
            out.extend_from_slice(&h.identification.to_be_bytes());
            let behavior = ip_ctx.v4.as_ref();
            let mut flags = 0u8;
            if h.dont_fragment {
                flags |= 0x80;
            }
            if behavior.map_or(false, |b| b.rnd) {
                flags |= 0x40;
            }
            if behavior.map_or(true, |b| b.nbo) {
                flags |= 0x20;
            }
            out.push(flags);
        }
        IpHeader::V6(h) => {
            out.push(h.traffic_class);
            out.push(h.hop_limit);
        }
    }
}

fn build_ir<P: Rfc3095Profile + ?Sized>(
    profile: &P,
    ctx: &Rfc3095Context,
    crc8: u8,
    with_dynamic: bool,
    core: &mut Vec<u8>,
) {
    core.push(IR_PACKET_TYPE_BASE | u8::from(with_dynamic));
    core.push(profile.profile_id().wire_byte());
    core.push(crc8);
    build_ip_static_chain(ctx, core);
    profile.static_chain_transport(ctx, core);
    if with_dynamic {
        build_ip_dynamic_chain(ctx, core);
        profile.dynamic_chain_transport(ctx, core);
    }
    profile.ir_remainder(ctx, core);
}

fn build_ir_dyn<P: Rfc3095Profile + ?Sized>(
    profile: &P,
    ctx: &Rfc3095Context,
    crc8: u8,
    core: &mut Vec<u8>,
) {
    core.push(IR_DYN_PACKET_TYPE);
    core.push(profile.profile_id().wire_byte());
    core.push(crc8);
    build_ip_dynamic_chain(ctx, core);
    profile.dynamic_chain_transport(ctx, core);
    profile.ir_remainder(ctx, core);
}

/// UOR-2 extension selected by the remaining SN/IP-ID bit requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    None,
    Ext0,
    Ext1,
    Ext2,
    Ext3,
}

fn decide_extension(ctx: &Rfc3095Context) -> Extension {
    // Changed header fields can only travel in extension 3.
    if ctx.tmp.send_static > 0 || ctx.tmp.send_dynamic > 0 {
        return Extension::Ext3;
    }

    let sn_bits = ctx.tmp.sn_bits;
    let outer = if ctx.tmp.no_outer_ip_id_bits {
        0
    } else {
        ctx.tmp.outer_ip_id_bits
    };
    let inner = if ctx.tmp.no_inner_ip_id_bits {
        0
    } else {
        ctx.tmp.inner_ip_id_bits
    };

    if sn_bits <= 5 && outer == 0 && inner == 0 {
        Extension::None
    } else if sn_bits <= 8 && outer <= 3 && inner == 0 {
        Extension::Ext0
    } else if sn_bits <= 8 && outer <= 11 && inner == 0 {
        Extension::Ext1
    } else if ctx.ip_header_count() > 1 && sn_bits <= 8 && outer <= 11 && inner <= 8 {
        Extension::Ext2
    } else {
        Extension::Ext3
    }
}

fn build_extension(ctx: &Rfc3095Context, extension: Extension, out: &mut Vec<u8>) {
    let sn = ctx.tmp.new_sn.value();
    let outer_offset = ctx.tmp.outer_ip_id_offset;
    match extension {
        Extension::None => {}
        Extension::Ext0 => {
            out.push(((sn as u8 & 0x07) << 3) | (outer_offset as u8 & 0x07));
        }
        Extension::Ext1 => {
            out.push(0b0100_0000 | ((sn as u8 & 0x07) << 3) | ((outer_offset >> 8) as u8 & 0x07));
            out.push(outer_offset as u8);
        }
        Extension::Ext2 => {
            out.push(0b1000_0000 | ((sn as u8 & 0x07) << 3) | ((outer_offset >> 8) as u8 & 0x07));
            out.push(outer_offset as u8);
            out.push(ctx.tmp.inner_ip_id_offset as u8);
        }
        Extension::Ext3 => build_extension3(ctx, out),
    }
}

/// Extension 3 for the non-RTP profiles (RFC 3095 §5.7.5): carries the
/// upper SN bits and rewrites IP header fields that changed.
fn build_extension3(ctx: &Rfc3095Context, out: &mut Vec<u8>) {
    let send_sn = ctx.tmp.sn_bits > 5;
    // The innermost IPv4 header's full offset travels in the I field.
    let (send_ip_id, ip_id_offset_to_send) = if ctx.inner_ip.is_some() {
        (!ctx.tmp.no_inner_ip_id_bits, ctx.tmp.inner_ip_id_offset)
    } else {
        (!ctx.tmp.no_outer_ip_id_bits, ctx.tmp.outer_ip_id_offset)
    };
    let ip_fields_changed = ctx.tmp.send_dynamic > 0 || ctx.tmp.send_static > 0;
    let has_outer = ctx.inner_ip.is_some();

    // Flags: 1 1 S mode(2) I ip ip2 — mode is always 0 (U-mode).
    let mut flags = 0b1100_0000;
    if send_sn {
        flags |= 0b0010_0000;
    }
    if send_ip_id {
        flags |= 0b0000_0100;
    }
    if ip_fields_changed {
        flags |= 0b0000_0010;
    }
    if has_outer && ip_fields_changed {
        flags |= 0b0000_0001;
    }
    out.push(flags);

    if ip_fields_changed {
        let innermost = ctx.inner_ip.as_ref().unwrap_or(&ctx.outer_ip);
        build_ext3_ip_fields(innermost, out);
        if has_outer {
            build_ext3_ip_fields(&ctx.outer_ip, out);
        }
    }
    if send_sn {
        out.push((ctx.tmp.new_sn.value() >> 5) as u8);
    }
    if send_ip_id {
        out.extend_from_slice(&ip_id_offset_to_send.to_be_bytes());
    }
}

/// IP header flags + fields block of extension 3.
pub(crate) fn build_ext3_ip_fields(ip_ctx: &IpHeaderContext, out: &mut Vec<u8>) {
    match &ip_ctx.last {
        IpHeader::V4(h) => {
            // Flags: TOS TTL DF PR IPX NBO RND 0
            let behavior = ip_ctx.v4.as_ref();
            let mut flags = 0b1101_0000; // TOS, TTL, PR always rewritten
            if h.dont_fragment {
                flags |= 0b0010_0000;
            }
            if behavior.map_or(true, |b| b.nbo) {
                flags |= 0b0000_0100;
            }
            if behavior.map_or(false, |b| b.rnd) {
                flags |= 0b0000_0010;
            }
            out.push(flags);
            out.push(h.tos);
            out.push(h.ttl);
            out.push(h.protocol);
        }
        IpHeader::V6(h) => {
            out.push(0b1101_0000 | 0b0000_0100);
            out.push(h.traffic_class);
            out.push(h.hop_limit);
            out.push(h.next_header);
        }
    }
}

/// Random IP-IDs cannot be windowed: each UO packet carries them verbatim,
/// outer header first (RFC 3095 §5.7).
fn append_random_ip_ids(ctx: &Rfc3095Context, headers: &PacketHeaders, out: &mut Vec<u8>) {
    if let (Some(behavior), Some(v4)) = (&ctx.outer_ip.v4, headers.outer.as_v4()) {
        if behavior.rnd {
            out.extend_from_slice(&v4.identification.to_be_bytes());
        }
    }
    if let (Some(inner_ctx), Some(inner_new)) = (&ctx.inner_ip, &headers.inner) {
        if let (Some(behavior), Some(v4)) = (&inner_ctx.v4, inner_new.as_v4()) {
            if behavior.rnd {
                out.extend_from_slice(&v4.identification.to_be_bytes());
            }
        }
    }
}

/// Generic UO-0 / UO-1 / UOR-2 builder for the non-RTP profiles.
pub fn build_uo_generic(
    ctx: &Rfc3095Context,
    packet_type: PacketType,
    crc3: u8,
    crc7: u8,
    core: &mut Vec<u8>,
) -> Result<(), RohcBuildingError> {
    let sn = ctx.tmp.new_sn.value();
    match packet_type {
        PacketType::Uo0 => {
            core.push(((sn as u8 & 0x0F) << 3) | (crc3 & 0x07));
        }
        PacketType::Uo1 => {
            core.push(0b1000_0000 | (ctx.tmp.outer_ip_id_offset as u8 & 0x3F));
            core.push(((sn as u8 & 0x1F) << 3) | (crc3 & 0x07));
        }
        PacketType::Uor2 => {
            let extension = decide_extension(ctx);
            core.push(0b1100_0000 | (sn as u8 & 0x1F));
            let x = u8::from(extension != Extension::None);
            core.push((x << 7) | (crc7 & 0x7F));
            build_extension(ctx, extension, core);
        }
        other => {
            log::warn!("packet type {} not built by the generic UO builder", other.descr());
            return Err(RohcBuildingError::ContextInsufficient {
                reason: "packet type requires a profile-specific builder",
            });
        }
    }
    Ok(())
}
