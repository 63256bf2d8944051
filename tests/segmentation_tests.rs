//! Segmentation of oversized ROHC packets.

mod common;

use common::{compressor_with, ipv6_udp_packet};
use rohcpress::{CompressOutcome, CompressionError, RohcError, RohcProfile};

#[test]
fn oversized_packet_is_segmented_and_fcs_verifies() {
    let mut comp = compressor_with(&[RohcProfile::Udp]);
    comp.set_mrru(1500).unwrap();

    let packet = ipv6_udp_packet(1200);
    let mut tiny = [0u8; 3];
    let outcome = comp.compress(None, &packet, &mut tiny).unwrap();
    assert_eq!(outcome, CompressOutcome::NeedsSegmentation);

    // Drain the segments with 100-byte buffers.
    let mut segments = Vec::new();
    loop {
        let mut buf = [0u8; 100];
        let seg = comp.get_segment(&mut buf).unwrap();
        segments.push(buf[..seg.len].to_vec());
        if seg.is_final {
            break;
        }
    }
    assert!(segments.len() > 1);

    // Non-final segments start with 0xFE, the final one with 0xFF.
    for seg in &segments[..segments.len() - 1] {
        assert_eq!(seg[0], 0xFE);
    }
    assert_eq!(segments.last().unwrap()[0], 0xFF);

    // Reassembly: strip the type octets, check the FCS-32 trailer.
    let unit: Vec<u8> = segments.iter().flat_map(|s| s[1..].iter().copied()).collect();
    assert!(unit.len() >= 4);
    let (content, trailer) = unit.split_at(unit.len() - 4);
    let fcs = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let crc = rohcpress::crc::CrcCalculators::new();
    assert_eq!(crc.fcs32(content), fcs);

    // Nothing remains once the final segment was emitted.
    let mut buf = [0u8; 100];
    assert!(matches!(
        comp.get_segment(&mut buf).unwrap_err(),
        RohcError::Compression(CompressionError::NoRruAvailable)
    ));
}

#[test]
fn segmentation_disabled_rejects_oversized_packets() {
    let mut comp = compressor_with(&[RohcProfile::Udp]);
    // MRRU defaults to 0: no segmentation allowed.
    let packet = ipv6_udp_packet(1200);
    let mut tiny = [0u8; 3];
    let err = comp.compress(None, &packet, &mut tiny).unwrap_err();
    assert!(matches!(
        err,
        RohcError::Compression(CompressionError::PacketTooLarge { mrru: 0, .. })
    ));
}

#[test]
fn packet_larger_than_mrru_is_rejected() {
    let mut comp = compressor_with(&[RohcProfile::Udp]);
    comp.set_mrru(100).unwrap();
    let packet = ipv6_udp_packet(1200);
    let mut tiny = [0u8; 3];
    let err = comp.compress(None, &packet, &mut tiny).unwrap_err();
    assert!(matches!(
        err,
        RohcError::Compression(CompressionError::PacketTooLarge { mrru: 100, .. })
    ));
}

#[test]
fn large_buffer_avoids_segmentation_entirely() {
    let mut comp = compressor_with(&[RohcProfile::Udp]);
    comp.set_mrru(1500).unwrap();
    let packet = ipv6_udp_packet(1200);
    let mut out = [0u8; 2048];
    let outcome = comp.compress(None, &packet, &mut out).unwrap();
    assert!(matches!(outcome, CompressOutcome::Packet(_)));
}

#[test]
fn segment_sizes_respect_the_callers_buffer() {
    let mut comp = compressor_with(&[RohcProfile::Udp]);
    comp.set_mrru(1500).unwrap();
    let packet = ipv6_udp_packet(600);
    let mut tiny = [0u8; 3];
    comp.compress(None, &packet, &mut tiny).unwrap();

    let mut buf = [0u8; 64];
    let seg = comp.get_segment(&mut buf).unwrap();
    assert_eq!(seg.len, 64, "segment must fill the offered buffer");
    assert!(!seg.is_final);
}
