//! ESP/IP compression profile (0x0003, RFC 3095 §5.12).
//!
//! Compresses the IP chain plus the 8-byte ESP header: the SPI is static,
//! the low 16 bits of the ESP sequence number serve as the context SN.
//! The encrypted remainder of the ESP packet is opaque payload.

use crate::constants::{ESP_MIN_HEADER_LENGTH, IP_PROTOCOL_ESP};
use crate::context::{CompressorContext, ContextState, ProfileContext};
use crate::error::RohcError;
use crate::feedback::{FeedbackInfo, FeedbackKind};
use crate::headers::{parse_esp, PacketHeaders};
use crate::profiles::rfc3095::{self, Rfc3095Context, Rfc3095Profile, TransportContext};
use crate::profiles::{
    chain_compressible, ip_chain_key, ContextParams, EncodeSettings, EncodedHeader, ProfileHandler,
    RohcProfile, SelectionContext,
};
use crate::types::{ContextKey, SequenceNumber};

/// The ESP/IP profile.
#[derive(Debug)]
pub struct EspProfile;

impl Rfc3095Profile for EspProfile {
    fn profile_id(&self) -> RohcProfile {
        RohcProfile::Esp
    }

    fn next_sn(
        &self,
        ctx: &Rfc3095Context,
        packet: &[u8],
        headers: &PacketHeaders,
    ) -> SequenceNumber {
        // The ESP sequence number is the SN source; windowed tracking of
        // the full 32-bit value is out of scope.
        parse_esp(&packet[headers.transport_offset..])
            .map(|esp| SequenceNumber::new(esp.sequence as u16))
            .unwrap_or(ctx.sn + 1)
    }

    fn compressed_header_len(
        &self,
        _packet: &[u8],
        headers: &PacketHeaders,
    ) -> Result<usize, RohcError> {
        Ok(headers.transport_offset + ESP_MIN_HEADER_LENGTH)
    }

    fn static_chain_transport(&self, ctx: &Rfc3095Context, out: &mut Vec<u8>) {
        if let TransportContext::Esp(esp) = &ctx.transport {
            out.extend_from_slice(&esp.spi.to_be_bytes());
        }
    }

    fn dynamic_chain_transport(&self, ctx: &Rfc3095Context, out: &mut Vec<u8>) {
        if let TransportContext::Esp(esp) = &ctx.transport {
            out.extend_from_slice(&esp.sequence.to_be_bytes());
        }
    }

    fn update_transport(&self, ctx: &mut Rfc3095Context, packet: &[u8], headers: &PacketHeaders) {
        if let Ok(esp) = parse_esp(&packet[headers.transport_offset..]) {
            ctx.transport = TransportContext::Esp(esp);
        }
    }
}

impl ProfileHandler for EspProfile {
    fn profile_id(&self) -> RohcProfile {
        RohcProfile::Esp
    }

    fn description(&self) -> &'static str {
        "ESP / Compressor"
    }

    fn accepts(
        &self,
        packet: &[u8],
        headers: &PacketHeaders,
        _selection: &SelectionContext<'_>,
    ) -> Option<ContextKey> {
        if headers.next_protocol != IP_PROTOCOL_ESP || !chain_compressible(headers) {
            return None;
        }
        let esp = parse_esp(&packet[headers.transport_offset..]).ok()?;
        Some(ip_chain_key(headers).mix_u32(esp.spi))
    }

    fn create_context(
        &self,
        packet: &[u8],
        headers: &PacketHeaders,
        params: &ContextParams,
    ) -> Result<ProfileContext, RohcError> {
        let esp = parse_esp(&packet[headers.transport_offset..])?;
        let initial_sn = esp.sequence as u16;
        Ok(ProfileContext::Rfc3095(Box::new(Rfc3095Context::new(
            headers,
            TransportContext::Esp(esp),
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
        let Ok(esp) = parse_esp(&packet[headers.transport_offset..]) else {
            return false;
        };
        matches!(&ctx.transport, TransportContext::Esp(last) if last.spi == esp.spi)
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
}

#[cfg(test)]
mod tests {
    use super::*;

    fn esp_packet(spi: u32, sequence: u32) -> Vec<u8> {
        let mut pkt = vec![0u8; 44];
        pkt[0] = 0x45;
        pkt[2..4].copy_from_slice(&44u16.to_be_bytes());
        pkt[8] = 64;
        pkt[9] = IP_PROTOCOL_ESP;
        pkt[12..16].copy_from_slice(&[10, 0, 0, 1]);
        pkt[16..20].copy_from_slice(&[10, 0, 0, 2]);
        pkt[20..24].copy_from_slice(&spi.to_be_bytes());
        pkt[24..28].copy_from_slice(&sequence.to_be_bytes());
        pkt
    }

    #[test]
    fn accepts_esp_and_keys_on_spi() {
        let selection = SelectionContext {
            rtp_ports: &[],
            rtp_detector: None,
        };
        let a = esp_packet(0x1111, 1);
        let b = esp_packet(0x2222, 1);
        let ha = PacketHeaders::parse(&a).unwrap();
        let hb = PacketHeaders::parse(&b).unwrap();
        let key_a = EspProfile.accepts(&a, &ha, &selection).unwrap();
        let key_b = EspProfile.accepts(&b, &hb, &selection).unwrap();
        assert_ne!(key_a, key_b);
    }

    #[test]
    fn sn_tracks_esp_sequence() {
        let pkt = esp_packet(0xABCD, 41);
        let headers = PacketHeaders::parse(&pkt).unwrap();
        let params = ContextParams {
            wlsb_width: 16,
            initial_sn: 0,
        };
        let data = EspProfile.create_context(&pkt, &headers, &params).unwrap();
        let ctx = data.rfc3095().unwrap();

        let next = esp_packet(0xABCD, 42);
        let next_headers = PacketHeaders::parse(&next).unwrap();
        assert_eq!(EspProfile.next_sn(ctx, &next, &next_headers), 42);
    }
}
