//! ROHC compression profiles.
//!
//! Each profile implements the [`ProfileHandler`] capability set the engine
//! drives. The registry is a priority-ordered static list: the RTP profile
//! is evaluated before the UDP one so RTP-over-UDP flows are caught first,
//! the IP-only profile comes after every transport-aware profile, and the
//! Uncompressed profile sits last as the floor that accepts anything.

pub mod esp;
pub mod ip;
pub mod rfc3095;
pub mod rtp;
pub mod udp;
pub mod udp_lite;
pub mod uncompressed;

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::constants::{
    PROFILE_ID_ESP, PROFILE_ID_IP, PROFILE_ID_RTP, PROFILE_ID_TCP, PROFILE_ID_UDP,
    PROFILE_ID_UDP_LITE, PROFILE_ID_UNCOMPRESSED,
};
use crate::context::ProfileContext;
use crate::crc::CrcCalculators;
use crate::error::RohcError;
use crate::feedback::FeedbackInfo;
use crate::headers::{PacketHeaders, UdpHeader};
use crate::types::{CidType, ContextId, ContextKey};

/// Supported ROHC profile identifiers (IANA numbers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RohcProfile {
    /// Uncompressed passthrough (0x0000)
    Uncompressed,
    /// RTP/UDP/IP (0x0001)
    Rtp,
    /// UDP/IP (0x0002)
    Udp,
    /// ESP/IP (0x0003)
    Esp,
    /// IP-only (0x0004, RFC 3843)
    Ip,
    /// TCP/IP (0x0006), declared but not implemented
    Tcp,
    /// UDP-Lite/IP (0x0008, RFC 4019)
    UdpLite,
    /// Unknown or unsupported profile
    Unknown(u16),
}

impl From<u16> for RohcProfile {
    fn from(value: u16) -> Self {
        match value {
            PROFILE_ID_UNCOMPRESSED => RohcProfile::Uncompressed,
            PROFILE_ID_RTP => RohcProfile::Rtp,
            PROFILE_ID_UDP => RohcProfile::Udp,
            PROFILE_ID_ESP => RohcProfile::Esp,
            PROFILE_ID_IP => RohcProfile::Ip,
            PROFILE_ID_TCP => RohcProfile::Tcp,
            PROFILE_ID_UDP_LITE => RohcProfile::UdpLite,
            unknown => RohcProfile::Unknown(unknown),
        }
    }
}

impl From<RohcProfile> for u16 {
    fn from(profile: RohcProfile) -> Self {
        match profile {
            RohcProfile::Uncompressed => PROFILE_ID_UNCOMPRESSED,
            RohcProfile::Rtp => PROFILE_ID_RTP,
            RohcProfile::Udp => PROFILE_ID_UDP,
            RohcProfile::Esp => PROFILE_ID_ESP,
            RohcProfile::Ip => PROFILE_ID_IP,
            RohcProfile::Tcp => PROFILE_ID_TCP,
            RohcProfile::UdpLite => PROFILE_ID_UDP_LITE,
            RohcProfile::Unknown(value) => value,
        }
    }
}

impl RohcProfile {
    /// Low byte of the profile identifier as carried in IR/IR-DYN packets.
    pub fn wire_byte(self) -> u8 {
        u16::from(self) as u8
    }
}

/// The ROHC packet formats this compressor can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PacketType {
    Ir,
    IrDyn,
    Uo0,
    Uo1,
    Uo1Ts,
    Uo1Id,
    Uor2,
    Uor2Ts,
    Uor2Id,
    Normal,
}

impl PacketType {
    /// Short wire-format name for logs and statistics.
    pub fn descr(self) -> &'static str {
        match self {
            PacketType::Ir => "IR",
            PacketType::IrDyn => "IR-DYN",
            PacketType::Uo0 => "UO-0",
            PacketType::Uo1 => "UO-1",
            PacketType::Uo1Ts => "UO-1-TS",
            PacketType::Uo1Id => "UO-1-ID",
            PacketType::Uor2 => "UOR-2",
            PacketType::Uor2Ts => "UOR-2-TS",
            PacketType::Uor2Id => "UOR-2-ID",
            PacketType::Normal => "Normal",
        }
    }
}

/// Callback deciding whether a UDP packet carries RTP.
pub type RtpDetector = dyn Fn(&PacketHeaders, &UdpHeader, &[u8]) -> bool + Send + Sync;

/// Read-only view the profile selector needs from the compressor.
pub struct SelectionContext<'a> {
    /// Sorted list of UDP ports dedicated to RTP streams.
    pub rtp_ports: &'a [u16],
    /// Optional detection callback; overrides the port list when set.
    pub rtp_detector: Option<&'a RtpDetector>,
}

/// Parameters handed to a profile when it creates a context block.
#[derive(Debug, Clone, Copy)]
pub struct ContextParams {
    /// Width of every W-LSB window (power of two).
    pub wlsb_width: usize,
    /// Random initial SN for profiles that maintain an internal counter.
    pub initial_sn: u16,
}

/// Settings the packet builders need from the compressor.
pub struct EncodeSettings<'a> {
    pub crc: &'a CrcCalculators,
    pub cid_type: CidType,
    pub cid: ContextId,
    /// Periodic-refresh timeout back to IR, in packets.
    pub ir_refresh_timeout: u32,
    /// Periodic-refresh timeout back to FO, in packets.
    pub fo_refresh_timeout: u32,
}

/// Result of one profile encode: the staged ROHC header plus bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedHeader {
    /// Packet format that was chosen.
    pub packet_type: PacketType,
    /// Bytes of the original packet subsumed by the compressed header;
    /// the payload to append starts here.
    pub payload_offset: usize,
}

/// Capability set of one compression profile.
///
/// Mirrors the classic ROHC function table: identification, packet
/// acceptance, context lifecycle, header encoding, feedback handling.
pub trait ProfileHandler: Send + Sync + Debug {
    /// Profile identifier.
    fn profile_id(&self) -> RohcProfile;

    /// Human-readable profile name for logs and statistics.
    fn description(&self) -> &'static str;

    /// Whether this profile accepts the packet; on success returns the
    /// context key derived from its header fields.
    fn accepts(
        &self,
        packet: &[u8],
        headers: &PacketHeaders,
        selection: &SelectionContext<'_>,
    ) -> Option<ContextKey>;

    /// Builds a fresh profile-specific context block for the packet.
    fn create_context(
        &self,
        packet: &[u8],
        headers: &PacketHeaders,
        params: &ContextParams,
    ) -> Result<ProfileContext, RohcError>;

    /// Content match confirming a key hit really belongs to this flow.
    fn matches_context(
        &self,
        context: &ProfileContext,
        packet: &[u8],
        headers: &PacketHeaders,
    ) -> bool;

    /// Encodes the ROHC header for `packet` into `out` (a staging buffer),
    /// advancing the context state machine.
    fn encode(
        &self,
        context: &mut crate::context::CompressorContext,
        packet: &[u8],
        headers: &PacketHeaders,
        settings: &EncodeSettings<'_>,
        out: &mut Vec<u8>,
    ) -> Result<EncodedHeader, RohcError>;

    /// Forces the context back to its initial state (next packet is IR).
    fn reinit_context(&self, context: &mut crate::context::CompressorContext);

    /// Applies received feedback to the context.
    fn handle_feedback(&self, context: &mut crate::context::CompressorContext, info: &FeedbackInfo);

    /// Whether the context compresses a flow using the given UDP port.
    fn uses_udp_port(&self, context: &ProfileContext, port: u16) -> bool {
        let _ = (context, port);
        false
    }
}

/// Per-flow key over the IP chain: addresses, flow label, next protocol.
/// Transport-aware profiles mix their own discriminators on top.
pub(crate) fn ip_chain_key(headers: &PacketHeaders) -> ContextKey {
    let mut key = mix_ip(ContextKey::default(), &headers.outer);
    if let Some(inner) = &headers.inner {
        key = mix_ip(key, inner);
    }
    key.mix_bytes(&[headers.next_protocol])
}

fn mix_ip(key: ContextKey, header: &crate::headers::IpHeader) -> ContextKey {
    match header {
        crate::headers::IpHeader::V4(h) => key
            .mix_bytes(&h.source.octets())
            .mix_bytes(&h.destination.octets()),
        crate::headers::IpHeader::V6(h) => key
            .mix_bytes(&h.source.octets())
            .mix_bytes(&h.destination.octets())
            .mix_u32(h.flow_label),
    }
}

/// Whether the IP chain is compressible by the RFC 3095 family: no
/// fragments and no IPv4 options anywhere.
pub(crate) fn chain_compressible(headers: &PacketHeaders) -> bool {
    let header_ok = |h: &crate::headers::IpHeader| match h {
        crate::headers::IpHeader::V4(v4) => {
            !v4.is_fragment() && v4.header_length == crate::constants::IPV4_MIN_HEADER_LENGTH
        }
        crate::headers::IpHeader::V6(_) => true,
    };
    header_ok(&headers.outer) && headers.inner.as_ref().map_or(true, header_ok)
}

/// The compression profiles in evaluation order.
///
/// The order is part of the selection algorithm: first match wins.
pub fn registry() -> &'static [&'static dyn ProfileHandler] {
    static PROFILES: &[&dyn ProfileHandler] = &[
        &rtp::RtpProfile,
        &udp::UdpProfile, // must come after the RTP profile
        &udp_lite::UdpLiteProfile,
        &esp::EspProfile,
        &ip::IpProfile, // must come after all transport-aware profiles
        &uncompressed::UncompressedProfile, // must come last
    ];
    PROFILES
}

/// Finds the handler for a profile ID, if one is implemented.
pub fn handler_for(profile: RohcProfile) -> Option<&'static dyn ProfileHandler> {
    registry().iter().copied().find(|p| p.profile_id() == profile)
}
