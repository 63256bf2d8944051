//! Error types for the ROHC compressor core.
//!
//! Distinguishes between uncompressed-header parsing errors, ROHC packet
//! building errors, and engine-level compression errors. The `thiserror`
//! crate is used for ergonomic error definitions.

use thiserror::Error;

use crate::types::ContextId;

/// Locations reported by parsing errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseContext {
    UncompressedPacket,
    Ipv4Header,
    Ipv6Header,
    InnerIpHeader,
    UdpHeader,
    UdpLiteHeader,
    EspHeader,
    RtpHeader,
    SdvlValue,
    FeedbackPacket,
}

impl std::fmt::Display for ParseContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::UncompressedPacket => "uncompressed packet",
            Self::Ipv4Header => "IPv4 header",
            Self::Ipv6Header => "IPv6 header",
            Self::InnerIpHeader => "inner IP header",
            Self::UdpHeader => "UDP header",
            Self::UdpLiteHeader => "UDP-Lite header",
            Self::EspHeader => "ESP header",
            Self::RtpHeader => "RTP header",
            Self::SdvlValue => "SDVL-encoded value",
            Self::FeedbackPacket => "feedback packet",
        };
        write!(f, "{}", s)
    }
}

/// Errors raised while parsing uncompressed headers or feedback data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RohcParsingError {
    /// Insufficient data to parse a complete field or structure.
    #[error("incomplete data: needed {needed} bytes, got {got} for {context}")]
    NotEnoughData {
        needed: usize,
        got: usize,
        context: ParseContext,
    },

    /// Version nibble is neither 4 nor 6.
    #[error("unsupported IP version {version}")]
    UnsupportedIpVersion { version: u8 },

    /// Declared total length disagrees with the buffer.
    #[error("IP total length {declared} exceeds buffer of {available} bytes")]
    TruncatedPacket { declared: usize, available: usize },

    /// More than two nested IP headers.
    #[error("more than two nested IP headers")]
    TooManyIpHeaders,

    /// An SDVL value could not be decoded or encoded.
    #[error("invalid SDVL encoding: {reason}")]
    InvalidSdvl { reason: &'static str },
}

/// Errors raised while building a ROHC packet.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RohcBuildingError {
    /// Staging buffer was too small for the packet being built.
    #[error("buffer too small: needed {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    /// A field exceeds the bit budget of the chosen packet type.
    #[error("value {value} does not fit in {max_bits} bits")]
    FieldOverflow { value: u32, max_bits: u8 },

    /// The context lacks state required by the chosen packet type.
    #[error("context state insufficient: {reason}")]
    ContextInsufficient { reason: &'static str },
}

/// Errors raised by the compressor engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompressionError {
    /// No enabled profile accepted the packet.
    #[error("no profile found for packet with transport protocol {protocol}")]
    NoProfileFound { protocol: u8 },

    /// Context array is full and no slot could be recycled.
    #[error("all {capacity} contexts are in use")]
    ContextsExhausted { capacity: usize },

    /// The feedback ring has no free slot.
    #[error("feedback ring is full")]
    FeedbackRingFull,

    /// Caller buffer too small and the packet cannot be segmented.
    #[error(
        "ROHC packet of {packet_len} bytes does not fit in {available} bytes and cannot be \
         segmented (MRRU = {mrru})"
    )]
    PacketTooLarge {
        packet_len: usize,
        available: usize,
        mrru: usize,
    },

    /// `get_segment` called while no RRU is buffered.
    #[error("no reconstructed reception unit awaits segmentation")]
    NoRruAvailable,

    /// A configuration setter was called after the first packet.
    #[error("configuration is frozen once packets have been compressed")]
    ConfigurationFrozen,

    /// A configuration value is out of its documented range.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: &'static str },

    /// No context exists for the given CID.
    #[error("context {cid} not found")]
    ContextNotFound { cid: ContextId },
}

/// Top-level error type for the ROHC compressor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RohcError {
    /// Error while parsing uncompressed headers or feedback.
    #[error("parsing error: {0}")]
    Parsing(#[from] RohcParsingError),

    /// Error while building a ROHC packet.
    #[error("building error: {0}")]
    Building(#[from] RohcBuildingError),

    /// Error in the compression engine.
    #[error("compression error: {0}")]
    Compression(#[from] CompressionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_enough_data_display() {
        let err = RohcParsingError::NotEnoughData {
            needed: 20,
            got: 7,
            context: ParseContext::Ipv4Header,
        };
        assert_eq!(
            format!("{}", err),
            "incomplete data: needed 20 bytes, got 7 for IPv4 header"
        );
    }

    #[test]
    fn rohc_error_from_parsing_error() {
        let parsing = RohcParsingError::TooManyIpHeaders;
        let err = RohcError::from(parsing.clone());
        match err {
            RohcError::Parsing(inner) => assert_eq!(inner, parsing),
            _ => panic!("incorrect RohcError variant"),
        }
    }

    #[test]
    fn rohc_error_from_compression_error() {
        let comp = CompressionError::FeedbackRingFull;
        let err = RohcError::from(comp.clone());
        match err {
            RohcError::Compression(inner) => assert_eq!(inner, comp),
            _ => panic!("incorrect RohcError variant"),
        }
    }

    #[test]
    fn packet_too_large_display_mentions_mrru() {
        let err = CompressionError::PacketTooLarge {
            packet_len: 1800,
            available: 100,
            mrru: 0,
        };
        assert!(format!("{}", err).contains("MRRU = 0"));
    }
}
