//! UDP/IP compression profile (0x0002, RFC 3095 §5.11).
//!
//! Extends the IP chain with the UDP ports in the static chain and the UDP
//! checksum in the dynamic chain. Like the IP-only profile it maintains an
//! internal random-initialized SN.

use crate::constants::{IP_PROTOCOL_UDP, UDP_HEADER_LENGTH};
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

/// The UDP/IP profile.
#[derive(Debug)]
pub struct UdpProfile;

impl Rfc3095Profile for UdpProfile {
    fn profile_id(&self) -> RohcProfile {
        RohcProfile::Udp
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
        let Ok(udp) = parse_udp(&packet[headers.transport_offset..], ParseContext::UdpHeader)
        else {
            return;
        };
        if let TransportContext::Udp(last) = &ctx.transport {
            // Checksum toggling between used and disabled is a dynamic change.
            if (last.checksum == 0) != (udp.checksum == 0) {
                ctx.tmp.send_dynamic += 1;
            }
        }
    }

    fn static_chain_transport(&self, ctx: &Rfc3095Context, out: &mut Vec<u8>) {
        if let TransportContext::Udp(udp) = &ctx.transport {
            out.extend_from_slice(&udp.source_port.to_be_bytes());
            out.extend_from_slice(&udp.destination_port.to_be_bytes());
        }
    }

    fn dynamic_chain_transport(&self, ctx: &Rfc3095Context, out: &mut Vec<u8>) {
        if let TransportContext::Udp(udp) = &ctx.transport {
            out.extend_from_slice(&udp.checksum.to_be_bytes());
        }
    }

    fn uo_transport_remainder(
        &self,
        ctx: &Rfc3095Context,
        packet: &[u8],
        headers: &PacketHeaders,
        out: &mut Vec<u8>,
    ) {
        // While the flow uses UDP checksums they ride every UO packet.
        let enabled = matches!(&ctx.transport, TransportContext::Udp(last) if last.checksum != 0);
        if enabled {
            if let Ok(udp) = parse_udp(&packet[headers.transport_offset..], ParseContext::UdpHeader)
            {
                out.extend_from_slice(&udp.checksum.to_be_bytes());
            }
        }
    }

    fn update_transport(&self, ctx: &mut Rfc3095Context, packet: &[u8], headers: &PacketHeaders) {
        if let Ok(udp) = parse_udp(&packet[headers.transport_offset..], ParseContext::UdpHeader) {
            ctx.transport = TransportContext::Udp(udp);
        }
    }
}

impl ProfileHandler for UdpProfile {
    fn profile_id(&self) -> RohcProfile {
        RohcProfile::Udp
    }

    fn description(&self) -> &'static str {
        "UDP / Compressor"
    }

    fn accepts(
        &self,
        packet: &[u8],
        headers: &PacketHeaders,
        _selection: &SelectionContext<'_>,
    ) -> Option<ContextKey> {
        if headers.next_protocol != IP_PROTOCOL_UDP || !chain_compressible(headers) {
            return None;
        }
        let udp = parse_udp(&packet[headers.transport_offset..], ParseContext::UdpHeader).ok()?;
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
        let udp = parse_udp(&packet[headers.transport_offset..], ParseContext::UdpHeader)?;
        Ok(ProfileContext::Rfc3095(Box::new(Rfc3095Context::new(
            headers,
            TransportContext::Udp(udp),
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
        let Ok(udp) = parse_udp(&packet[headers.transport_offset..], ParseContext::UdpHeader)
        else {
            return false;
        };
        matches!(&ctx.transport, TransportContext::Udp(last)
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
            matches!(&ctx.transport, TransportContext::Udp(udp)
                if udp.source_port == port || udp.destination_port == port)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn udp_packet(src_port: u16, dst_port: u16) -> Vec<u8> {
        let mut pkt = vec![0u8; 36];
        pkt[0] = 0x45;
        pkt[2..4].copy_from_slice(&36u16.to_be_bytes());
        pkt[8] = 64;
        pkt[9] = IP_PROTOCOL_UDP;
        pkt[12..16].copy_from_slice(&[10, 0, 0, 1]);
        pkt[16..20].copy_from_slice(&[10, 0, 0, 2]);
        pkt[20..22].copy_from_slice(&src_port.to_be_bytes());
        pkt[22..24].copy_from_slice(&dst_port.to_be_bytes());
        pkt[24..26].copy_from_slice(&16u16.to_be_bytes());
        pkt
    }

    fn selection<'a>() -> SelectionContext<'a> {
        SelectionContext {
            rtp_ports: &[],
            rtp_detector: None,
        }
    }

    #[test]
    fn accepts_udp_only() {
        let pkt = udp_packet(1000, 2000);
        let headers = PacketHeaders::parse(&pkt).unwrap();
        assert!(UdpProfile.accepts(&pkt, &headers, &selection()).is_some());

        let mut icmp = udp_packet(0, 0);
        icmp[9] = 1;
        let headers = PacketHeaders::parse(&icmp).unwrap();
        assert!(UdpProfile.accepts(&icmp, &headers, &selection()).is_none());
    }

    #[test]
    fn key_covers_ports() {
        let a = udp_packet(1000, 2000);
        let b = udp_packet(1000, 2001);
        let ha = PacketHeaders::parse(&a).unwrap();
        let hb = PacketHeaders::parse(&b).unwrap();
        assert_ne!(
            UdpProfile.accepts(&a, &ha, &selection()),
            UdpProfile.accepts(&b, &hb, &selection())
        );
    }

    #[test]
    fn uses_udp_port_matches_either_side() {
        let pkt = udp_packet(1234, 5678);
        let headers = PacketHeaders::parse(&pkt).unwrap();
        let params = ContextParams {
            wlsb_width: 16,
            initial_sn: 0,
        };
        let data = UdpProfile.create_context(&pkt, &headers, &params).unwrap();
        assert!(UdpProfile.uses_udp_port(&data, 1234));
        assert!(UdpProfile.uses_udp_port(&data, 5678));
        assert!(!UdpProfile.uses_udp_port(&data, 9999));
    }
}
