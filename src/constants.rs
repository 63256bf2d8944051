//! Generic ROHC protocol constants and bitmasks.
//!
//! Defines constants broadly applicable across the compressor framework or
//! standard protocol identifiers shared by several profiles. Profile-specific
//! constants live next to the profile that owns them.

// --- ROHC operational defaults ---

/// Default width of the W-LSB sliding windows. Must be a power of two.
pub const DEFAULT_WLSB_WINDOW_WIDTH: usize = 16;
/// Number of packets compressed in FO/SO before a periodic refresh back to IR.
pub const CHANGE_TO_IR_COUNT: u32 = 1700;
/// Number of packets compressed in SO before a periodic refresh back to FO.
pub const CHANGE_TO_FO_COUNT: u32 = 700;
/// Minimum number of IR packets sent before the IR -> FO transition.
pub const MAX_IR_COUNT: u32 = 3;
/// Minimum number of FO packets sent before the FO -> SO transition.
pub const MAX_FO_COUNT: u32 = 3;
/// Optimistic-approach repetitions required before trusting an IP-ID property.
pub const OA_REPETITIONS: u32 = 3;
/// Upper bound on the MRRU, CRC included (RFC 3095 §5.2.5).
pub const ROHC_MAX_MRRU: usize = 65535;
/// Number of slots in the piggybacked-feedback ring.
pub const FEEDBACK_RING_SIZE: usize = 64;
/// Capacity of the list of UDP ports dedicated to RTP streams.
pub const MAX_RTP_PORTS: usize = 15;
/// Ceiling on feedback bytes prepended to one compressed packet.
pub const MAX_FEEDBACK_PREFIX_BYTES: usize = 500;

// --- ROHC packet structure (RFC 3095 §5.2) ---

/// Mask for the prefix of an Add-CID octet.
pub const ADD_CID_PREFIX_MASK: u8 = 0b1110_0000;
/// Prefix value of an Add-CID octet (`1110xxxx`).
pub const ADD_CID_PREFIX_VALUE: u8 = 0b1110_0000;
/// Mask to extract the small CID (0-15) from an Add-CID octet.
pub const SMALL_CID_MASK: u8 = 0x0F;

/// Base value for IR packet type octets (bits 7-1: `1111110`).
pub const IR_PACKET_TYPE_BASE: u8 = 0b1111_1100;
/// Mask for the D-bit (dynamic chain present) in an IR packet type octet.
pub const IR_D_BIT_MASK: u8 = 0b0000_0001;
/// IR-DYN packet type octet (`11111000`).
pub const IR_DYN_PACKET_TYPE: u8 = 0b1111_1000;
/// Segment type octet for a non-final segment (`11111110`).
pub const SEGMENT_TYPE_NON_FINAL: u8 = 0b1111_1110;
/// Segment type octet for the final segment (`11111111`).
pub const SEGMENT_TYPE_FINAL: u8 = 0b1111_1111;
/// Feedback length-prefix base (`11110xxx`).
pub const FEEDBACK_PREFIX_BASE: u8 = 0b1111_0000;
/// Largest feedback length encodable in the 1-byte form factor.
pub const FEEDBACK_SMALL_LEN_MAX: usize = 7;

// --- ROHC profile identifiers (IANA, RFC 3095 §8 / RFC 3843 §5 / RFC 4019 §7) ---

/// ROHC Uncompressed profile (0x0000).
pub const PROFILE_ID_UNCOMPRESSED: u16 = 0x0000;
/// ROHC RTP/UDP/IP profile (0x0001).
pub const PROFILE_ID_RTP: u16 = 0x0001;
/// ROHC UDP/IP profile (0x0002).
pub const PROFILE_ID_UDP: u16 = 0x0002;
/// ROHC ESP/IP profile (0x0003).
pub const PROFILE_ID_ESP: u16 = 0x0003;
/// ROHC IP-only profile (0x0004).
pub const PROFILE_ID_IP: u16 = 0x0004;
/// ROHC TCP/IP profile (0x0006). Declared, not implemented.
pub const PROFILE_ID_TCP: u16 = 0x0006;
/// ROHC UDP-Lite/IP profile (0x0008).
pub const PROFILE_ID_UDP_LITE: u16 = 0x0008;

// --- Standard Internet protocol numbers (IANA assigned) ---

/// IP protocol number for IPv4-in-IP encapsulation.
pub const IP_PROTOCOL_IPIP: u8 = 4;
/// IP protocol number for TCP.
pub const IP_PROTOCOL_TCP: u8 = 6;
/// IP protocol number for UDP.
pub const IP_PROTOCOL_UDP: u8 = 17;
/// IP protocol number for IPv6 encapsulation.
pub const IP_PROTOCOL_IPV6: u8 = 41;
/// IP protocol number for ESP.
pub const IP_PROTOCOL_ESP: u8 = 50;
/// IP protocol number for UDP-Lite.
pub const IP_PROTOCOL_UDP_LITE: u8 = 136;

// --- General header field constants ---

/// Minimum IPv4 header length in bytes (IHL of 5 words).
pub const IPV4_MIN_HEADER_LENGTH: usize = 20;
/// Fixed IPv6 base header length in bytes.
pub const IPV6_HEADER_LENGTH: usize = 40;
/// UDP header length in bytes.
pub const UDP_HEADER_LENGTH: usize = 8;
/// Minimum ESP header length in bytes (SPI + sequence number).
pub const ESP_MIN_HEADER_LENGTH: usize = 8;
/// Minimum RTP header length in bytes (no CSRC list).
pub const RTP_MIN_HEADER_LENGTH: usize = 12;
/// RTP version number carried by all conforming streams.
pub const RTP_VERSION: u8 = 2;

// --- W-LSB `p` offsets (RFC 3095 §4.5.2 and §5.7) ---

/// `p` offset for sequence-number windows.
pub const P_OFFSET_SN: i64 = -1;
/// `p` offset for IP-ID windows.
pub const P_OFFSET_IP_ID: i64 = 0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_id_constants_match_iana() {
        assert_eq!(PROFILE_ID_UNCOMPRESSED, 0x0000);
        assert_eq!(PROFILE_ID_RTP, 0x0001);
        assert_eq!(PROFILE_ID_UDP, 0x0002);
        assert_eq!(PROFILE_ID_ESP, 0x0003);
        assert_eq!(PROFILE_ID_IP, 0x0004);
        assert_eq!(PROFILE_ID_UDP_LITE, 0x0008);
    }

    #[test]
    fn refresh_limits_are_ordered() {
        assert!(CHANGE_TO_IR_COUNT > CHANGE_TO_FO_COUNT);
        assert!(MAX_IR_COUNT > 0 && MAX_FO_COUNT > 0);
    }

    #[test]
    fn add_cid_octet_layout() {
        let octet = ADD_CID_PREFIX_VALUE | 5;
        assert_eq!(octet & ADD_CID_PREFIX_MASK, ADD_CID_PREFIX_VALUE);
        assert_eq!(octet & SMALL_CID_MASK, 5);
    }

    #[test]
    fn default_window_width_is_power_of_two() {
        assert!(DEFAULT_WLSB_WINDOW_WIDTH.is_power_of_two());
    }
}
