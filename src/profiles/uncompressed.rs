//! Uncompressed passthrough profile (0x0000, RFC 3095 §5.10).
//!
//! The floor of the profile registry: accepts any packet and wraps it in a
//! Normal packet (type octet, then the packet verbatim). Used directly
//! when it is the only enabled profile, and as the fallback when another
//! profile fails to encode mid-packet.

use crate::context::{CompressorContext, ContextState, ProfileContext};
use crate::error::RohcError;
use crate::feedback::FeedbackInfo;
use crate::headers::PacketHeaders;
use crate::profiles::rfc3095::assemble_with_cid;
use crate::profiles::{
    ip_chain_key, ContextParams, EncodeSettings, EncodedHeader, PacketType, ProfileHandler,
    RohcProfile, SelectionContext,
};
use crate::types::ContextKey;

/// Type octet of a Normal packet.
const NORMAL_PACKET_TYPE: u8 = 0b1111_1100;

/// The Uncompressed profile.
#[derive(Debug)]
pub struct UncompressedProfile;

impl ProfileHandler for UncompressedProfile {
    fn profile_id(&self) -> RohcProfile {
        RohcProfile::Uncompressed
    }

    fn description(&self) -> &'static str {
        "Uncompressed / Compressor"
    }

    fn accepts(
        &self,
        _packet: &[u8],
        headers: &PacketHeaders,
        _selection: &SelectionContext<'_>,
    ) -> Option<ContextKey> {
        // The floor profile accepts everything that parsed as IP.
        Some(ip_chain_key(headers))
    }

    fn create_context(
        &self,
        _packet: &[u8],
        _headers: &PacketHeaders,
        _params: &ContextParams,
    ) -> Result<ProfileContext, RohcError> {
        Ok(ProfileContext::Uncompressed)
    }

    fn matches_context(
        &self,
        context: &ProfileContext,
        _packet: &[u8],
        _headers: &PacketHeaders,
    ) -> bool {
        matches!(context, ProfileContext::Uncompressed)
    }

    fn encode(
        &self,
        context: &mut CompressorContext,
        packet: &[u8],
        headers: &PacketHeaders,
        settings: &EncodeSettings<'_>,
        out: &mut Vec<u8>,
    ) -> Result<EncodedHeader, RohcError> {
        let mut core = Vec::with_capacity(1 + packet.len());
        core.push(NORMAL_PACKET_TYPE);
        core.extend_from_slice(&packet[..headers.total_length]);
        assemble_with_cid(settings.cid, settings.cid_type, &core, out)?;

        context.state = ContextState::Ir;
        // The whole packet rides inside the "header"; nothing remains as
        // payload to append.
        Ok(EncodedHeader {
            packet_type: PacketType::Normal,
            payload_offset: headers.total_length,
        })
    }

    fn reinit_context(&self, context: &mut CompressorContext) {
        context.state = ContextState::Ir;
    }

    fn handle_feedback(&self, _context: &mut CompressorContext, _info: &FeedbackInfo) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CidType, ContextId};

    fn any_packet() -> Vec<u8> {
        let mut pkt = vec![0u8; 32];
        pkt[0] = 0x45;
        pkt[2..4].copy_from_slice(&32u16.to_be_bytes());
        pkt[8] = 1;
        pkt[9] = 47; // GRE: no dedicated profile would take this
        pkt[12..16].copy_from_slice(&[198, 51, 100, 1]);
        pkt[16..20].copy_from_slice(&[198, 51, 100, 2]);
        pkt
    }

    #[test]
    fn normal_packet_wraps_raw_bytes() {
        let crc = crate::crc::CrcCalculators::new();
        let pkt = any_packet();
        let headers = PacketHeaders::parse(&pkt).unwrap();
        let mut context = CompressorContext {
            cid: ContextId::new(0),
            profile: RohcProfile::Uncompressed,
            key: ContextKey::new(0),
            state: ContextState::Ir,
            mode: crate::context::RohcMode::Unidirectional,
            latest_used_tick: 0,
            first_used: None,
            latest_used: None,
            packet_type: PacketType::Normal,
            stats: Default::default(),
            data: ProfileContext::Uncompressed,
        };
        let settings = EncodeSettings {
            crc: &crc,
            cid_type: CidType::Small,
            cid: ContextId::new(0),
            ir_refresh_timeout: 1700,
            fo_refresh_timeout: 700,
        };
        let mut out = Vec::new();
        let encoded = UncompressedProfile
            .encode(&mut context, &pkt, &headers, &settings, &mut out)
            .unwrap();
        assert_eq!(encoded.packet_type, PacketType::Normal);
        assert_eq!(encoded.payload_offset, pkt.len());
        assert_eq!(out[0], NORMAL_PACKET_TYPE);
        assert_eq!(&out[1..], pkt.as_slice());
    }
}
