//! RTP flows: stride learning, minimal packets, timestamp gaps.

mod common;

use common::{compressor_with, rtp_packet};
use rohcpress::{PacketType, RohcProfile};

const SSRC: u32 = 0xDEADBEEF;
const TS_STRIDE: u32 = 160;

fn rtp_compressor() -> rohcpress::RohcCompressor {
    let mut comp = compressor_with(&[RohcProfile::Rtp, RohcProfile::Udp]);
    comp.add_rtp_port(5004).unwrap();
    comp
}

#[test]
fn steady_rtp_flow_converges_to_minimal_packets() {
    let mut comp = rtp_compressor();
    let mut out = [0u8; 256];

    let mut types = Vec::new();
    for i in 0..30u16 {
        let packet = rtp_packet(5004, 100 + i, 1000 + u32::from(i) * TS_STRIDE, SSRC, false);
        comp.compress(None, &packet, &mut out).unwrap();
        types.push(comp.last_packet_info().unwrap().packet_type);
    }

    assert_eq!(&types[..3], &[PacketType::Ir; 3]);
    // By packet ~8 the flow must ride the smallest formats.
    assert!(
        types[8..]
            .iter()
            .all(|t| matches!(t, PacketType::Uo0 | PacketType::Uo1Ts)),
        "expected UO-0/UO-1-TS tail, got {:?}",
        &types[8..]
    );
    assert!(types[8..].contains(&PacketType::Uo0));
}

#[test]
fn uo0_on_rtp_flow_is_one_byte() {
    let mut comp = rtp_compressor();
    let mut out = [0u8; 256];

    let mut minimal_len = usize::MAX;
    for i in 0..30u16 {
        let packet = rtp_packet(5004, 100 + i, 1000 + u32::from(i) * TS_STRIDE, SSRC, false);
        let rohcpress::CompressOutcome::Packet(len) =
            comp.compress(None, &packet, &mut out).unwrap()
        else {
            panic!("expected complete packets");
        };
        if comp.last_packet_info().unwrap().packet_type == PacketType::Uo0 {
            // Compressed size = 1-byte header + UDP/RTP payload.
            minimal_len = minimal_len.min(len - (packet.len() - 40));
        }
    }
    assert_eq!(minimal_len, 1);
}

#[test]
fn timestamp_gap_triggers_uor2_ts() {
    let mut comp = rtp_compressor();
    let mut out = [0u8; 256];

    let mut ts = 1000u32;
    for i in 0..20u16 {
        ts += TS_STRIDE;
        let packet = rtp_packet(5004, 100 + i, ts, SSRC, false);
        comp.compress(None, &packet, &mut out).unwrap();
    }

    // A silence gap: the timestamp jumps by a non-stride amount.
    ts += 7 * TS_STRIDE + 40;
    let packet = rtp_packet(5004, 120, ts, SSRC, false);
    comp.compress(None, &packet, &mut out).unwrap();
    let packet_type = comp.last_packet_info().unwrap().packet_type;
    assert!(
        matches!(packet_type, PacketType::Uor2Ts | PacketType::Uor2 | PacketType::IrDyn),
        "a TS gap cannot ride a minimal packet, got {:?}",
        packet_type
    );
}

#[test]
fn marker_toggle_avoids_uo0() {
    let mut comp = rtp_compressor();
    let mut out = [0u8; 256];

    let mut ts = 1000u32;
    for i in 0..15u16 {
        ts += TS_STRIDE;
        let packet = rtp_packet(5004, 100 + i, ts, SSRC, false);
        comp.compress(None, &packet, &mut out).unwrap();
    }

    ts += TS_STRIDE;
    let packet = rtp_packet(5004, 115, ts, SSRC, true);
    comp.compress(None, &packet, &mut out).unwrap();
    let packet_type = comp.last_packet_info().unwrap().packet_type;
    assert_ne!(
        packet_type,
        PacketType::Uo0,
        "a marker change cannot ride a UO-0"
    );
}

#[test]
fn ssrc_change_opens_a_new_context() {
    let mut comp = rtp_compressor();
    let mut out = [0u8; 256];

    comp.compress(None, &rtp_packet(5004, 100, 1000, SSRC, false), &mut out)
        .unwrap();
    comp.compress(None, &rtp_packet(5004, 50, 9000, 0x1234_5678, false), &mut out)
        .unwrap();
    assert_eq!(comp.contexts_used(), 2);
    assert_eq!(comp.last_packet_info().unwrap().packet_type, PacketType::Ir);
}

#[test]
fn rtp_ir_carries_ports_and_ssrc_in_static_chain() {
    let mut comp = rtp_compressor();
    let mut out = [0u8; 256];
    comp.compress(None, &rtp_packet(5004, 100, 1000, SSRC, false), &mut out)
        .unwrap();

    // type + profile + CRC-8, then IPv4 static chain (10 bytes), then the
    // RTP static part: source port, destination port, SSRC.
    assert_eq!(out[1], 0x01, "RTP profile identifier");
    let transport_static = &out[3 + 10..3 + 10 + 8];
    assert_eq!(u16::from_be_bytes([transport_static[0], transport_static[1]]), 5004);
    assert_eq!(u16::from_be_bytes([transport_static[2], transport_static[3]]), 5004);
    assert_eq!(
        u32::from_be_bytes([
            transport_static[4],
            transport_static[5],
            transport_static[6],
            transport_static[7]
        ]),
        SSRC
    );
}
