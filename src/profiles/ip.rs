//! IP-only compression profile (0x0004, RFC 3843).
//!
//! Compresses bare IPv4/IPv6 chains. The profile maintains an internal
//! 16-bit SN initialized to a random value (RFC 3095 §5.11.1) and carries
//! it as a 2-byte network-order field in the IR/IR-DYN remainder.

use crate::context::{CompressorContext, ContextState, ProfileContext};
use crate::error::RohcError;
use crate::feedback::{FeedbackInfo, FeedbackKind};
use crate::headers::PacketHeaders;
use crate::profiles::rfc3095::{self, Rfc3095Context, Rfc3095Profile, TransportContext};
use crate::profiles::{
    chain_compressible, ip_chain_key, ContextParams, EncodeSettings, EncodedHeader, ProfileHandler,
    RohcProfile, SelectionContext,
};
use crate::types::{ContextKey, SequenceNumber};

/// The IP-only profile.
#[derive(Debug)]
pub struct IpProfile;

impl Rfc3095Profile for IpProfile {
    fn profile_id(&self) -> RohcProfile {
        RohcProfile::Ip
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
        Ok(headers.transport_offset)
    }

    fn static_chain_transport(&self, _ctx: &Rfc3095Context, _out: &mut Vec<u8>) {}

    fn dynamic_chain_transport(&self, _ctx: &Rfc3095Context, _out: &mut Vec<u8>) {}
}

impl ProfileHandler for IpProfile {
    fn profile_id(&self) -> RohcProfile {
        RohcProfile::Ip
    }

    fn description(&self) -> &'static str {
        "IP / Compressor"
    }

    fn accepts(
        &self,
        _packet: &[u8],
        headers: &PacketHeaders,
        _selection: &SelectionContext<'_>,
    ) -> Option<ContextKey> {
        if !chain_compressible(headers) {
            return None;
        }
        Some(ip_chain_key(headers))
    }

    fn create_context(
        &self,
        _packet: &[u8],
        headers: &PacketHeaders,
        params: &ContextParams,
    ) -> Result<ProfileContext, RohcError> {
        Ok(ProfileContext::Rfc3095(Box::new(Rfc3095Context::new(
            headers,
            TransportContext::None,
            params.wlsb_width,
            params.initial_sn,
        ))))
    }

    fn matches_context(
        &self,
        context: &ProfileContext,
        _packet: &[u8],
        headers: &PacketHeaders,
    ) -> bool {
        context
            .rfc3095()
            .map_or(false, |ctx| rfc3095::same_chain_statics(ctx, headers))
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
        match info.kind {
            FeedbackKind::Ack => {}
            FeedbackKind::Nack | FeedbackKind::StaticNack => {
                log::debug!("CID {}: NACK received, back to IR", context.cid);
                self.reinit_context(context);
            }
        }
    }
}
