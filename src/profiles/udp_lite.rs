//! UDP-Lite/IP compression profile (0x0008, RFC 4019).
//!
//! UDP-Lite shares the UDP layout but replaces the length field with a
//! checksum coverage, which is dynamic: it travels in the dynamic chain
//! next to the checksum and a coverage change is a dynamic-field change.

use crate::constants::{IP_PROTOCOL_UDP_LITE, UDP_HEADER_LENGTH};
use crate::context::{CompressorContext, ContextState, ProfileContext};
use crate::error::{ParseContext, RohcError};
use crate::feedback::{FeedbackInfo, FeedbackKind};
use crate::headers::{parse_udp, PacketHeaders};
use crate::profiles::rfc3095::{self, Rfc3095Context, Rfc3095Profile, TransportContext};
use crate::profiles::{
    chain_compressible, ip_chain_key, ContextParams, EncodeSettings, EncodedHeader, ProfileHandler,
    RohcProfile, SelectionContext,
};
use crate::types::{ContextKey, SequenceNumber};

/// The UDP-Lite/IP profile.
#[derive(Debug)]
pub struct UdpLiteProfile;

impl Rfc3095Profile for UdpLiteProfile {
    fn profile_id(&self) -> RohcProfile {
        RohcProfile::UdpLite
    }

    fn next_sn(
        &self,
        ctx: &Rfc3095Context,
        _packet: &[u8],
        _headers: &PacketHeaders,
    ) -> SequenceNumber {
        ctx.sn + 1
    }

    fn compressed_header_len(
        &self,
        _packet: &[u8],
        headers: &PacketHeaders,
    ) -> Result<usize, RohcError> {
        Ok(headers.transport_offset + UDP_HEADER_LENGTH)
    }

    fn detect_transport_changes(
        &self,
        ctx: &mut Rfc3095Context,
        packet: &[u8],
        headers: &PacketHeaders,
    ) {
        let Ok(udp) = parse_udp(
            &packet[headers.transport_offset..],
            ParseContext::UdpLiteHeader,
        ) else {
            return;
        };
        if let TransportContext::UdpLite(last) = &ctx.transport {
            if last.length != udp.length {
                // Checksum coverage changed.
                ctx.tmp.send_dynamic += 1;
            }
        }
    }

    fn static_chain_transport(&self, ctx: &Rfc3095Context, out: &mut Vec<u8>) {
        if let TransportContext::UdpLite(udp) = &ctx.transport {
            out.extend_from_slice(&udp.source_port.to_be_bytes());
            out.extend_from_slice(&udp.destination_port.to_be_bytes());
        }
    }

    fn dynamic_chain_transport(&self, ctx: &Rfc3095Context, out: &mut Vec<u8>) {
        if let TransportContext::UdpLite(udp) = &ctx.transport {
            out.extend_from_slice(&udp.length.to_be_bytes());
            out.extend_from_slice(&udp.checksum.to_be_bytes());
        }
    }

    fn uo_transport_remainder(
        &self,
        _ctx: &Rfc3095Context,
        packet: &[u8],
        headers: &PacketHeaders,
        out: &mut Vec<u8>,
    ) {
        // The UDP-Lite checksum is mandatory and rides every UO packet; a
        // coverage change forces the context out of minimal updates first.
        if let Ok(udp) = parse_udp(
            &packet[headers.transport_offset..],
            ParseContext::UdpLiteHeader,
        ) {
            out.extend_from_slice(&udp.checksum.to_be_bytes());
        }
    }

    fn update_transport(&self, ctx: &mut Rfc3095Context, packet: &[u8], headers: &PacketHeaders) {
        if let Ok(udp) = parse_udp(
            &packet[headers.transport_offset..],
            ParseContext::UdpLiteHeader,
        ) {
            ctx.transport = TransportContext::UdpLite(udp);
        }
    }
}

impl ProfileHandler for UdpLiteProfile {
    fn profile_id(&self) -> RohcProfile {
        RohcProfile::UdpLite
    }

    fn description(&self) -> &'static str {
        "UDP-Lite / Compressor"
    }

    fn accepts(
        &self,
        packet: &[u8],
        headers: &PacketHeaders,
        _selection: &SelectionContext<'_>,
    ) -> Option<ContextKey> {
        if headers.next_protocol != IP_PROTOCOL_UDP_LITE || !chain_compressible(headers) {
            return None;
        }
        let udp = parse_udp(
            &packet[headers.transport_offset..],
            ParseContext::UdpLiteHeader,
        )
        .ok()?;
        Some(
            ip_chain_key(headers)
                .mix_u16(udp.source_port)
                .mix_u16(udp.destination_port),
        )
    }

    fn create_context(
        &self,
        packet: &[u8],
        headers: &PacketHeaders,
        params: &ContextParams,
    ) -> Result<ProfileContext, RohcError> {
        let udp = parse_udp(
            &packet[headers.transport_offset..],
            ParseContext::UdpLiteHeader,
        )?;
        Ok(ProfileContext::Rfc3095(Box::new(Rfc3095Context::new(
            headers,
            TransportContext::UdpLite(udp),
            params.wlsb_width,
            params.initial_sn,
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
        let Ok(udp) = parse_udp(
            &packet[headers.transport_offset..],
            ParseContext::UdpLiteHeader,
        ) else {
            return false;
        };
        matches!(&ctx.transport, TransportContext::UdpLite(last)
            if last.source_port == udp.source_port
                && last.destination_port == udp.destination_port)
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
            matches!(&ctx.transport, TransportContext::UdpLite(udp)
                if udp.source_port == port || udp.destination_port == port)
        })
    }
}
