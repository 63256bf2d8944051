//! Shared helpers for the integration test suites.

#![allow(dead_code)]

use rohcpress::{CidType, ContextId, RohcCompressor, RohcProfile};

/// IPv4/ICMP echo packet: 20-byte header, 64-byte payload.
pub fn ipv4_icmp_packet(ip_id: u16, ttl: u8) -> Vec<u8> {
    let mut pkt = vec![0u8; 84];
    pkt[0] = 0x45;
    pkt[2..4].copy_from_slice(&84u16.to_be_bytes());
    pkt[4..6].copy_from_slice(&ip_id.to_be_bytes());
    pkt[8] = ttl;
    pkt[9] = 1;
    pkt[12..16].copy_from_slice(&[192, 0, 2, 1]);
    pkt[16..20].copy_from_slice(&[192, 0, 2, 2]);
    for (i, byte) in pkt[20..].iter_mut().enumerate() {
        *byte = i as u8;
    }
    pkt
}

/// IPv4/UDP packet with configurable ports.
pub fn ipv4_udp_packet(src_port: u16, dst_port: u16, ip_id: u16, payload_len: usize) -> Vec<u8> {
    let total = 28 + payload_len;
    let mut pkt = vec![0u8; total];
    pkt[0] = 0x45;
    pkt[2..4].copy_from_slice(&(total as u16).to_be_bytes());
    pkt[4..6].copy_from_slice(&ip_id.to_be_bytes());
    pkt[8] = 64;
    pkt[9] = 17;
    pkt[12..16].copy_from_slice(&[10, 0, 0, 1]);
    pkt[16..20].copy_from_slice(&[10, 0, 0, 2]);
    pkt[20..22].copy_from_slice(&src_port.to_be_bytes());
    pkt[22..24].copy_from_slice(&dst_port.to_be_bytes());
    pkt[24..26].copy_from_slice(&((8 + payload_len) as u16).to_be_bytes());
    pkt
}

/// IPv4/UDP/RTP packet; the IP-ID tracks the RTP SN so the IP-ID offset
/// stays constant.
pub fn rtp_packet(dst_port: u16, sn: u16, ts: u32, ssrc: u32, marker: bool) -> Vec<u8> {
    let mut pkt = vec![0u8; 80];
    pkt[0] = 0x45;
    pkt[2..4].copy_from_slice(&80u16.to_be_bytes());
    pkt[4..6].copy_from_slice(&sn.to_be_bytes());
    pkt[8] = 64;
    pkt[9] = 17;
    pkt[12..16].copy_from_slice(&[192, 0, 2, 1]);
    pkt[16..20].copy_from_slice(&[192, 0, 2, 2]);
    pkt[20..22].copy_from_slice(&5004u16.to_be_bytes());
    pkt[22..24].copy_from_slice(&dst_port.to_be_bytes());
    pkt[24..26].copy_from_slice(&60u16.to_be_bytes());
    pkt[28] = 0x80;
    pkt[29] = (u8::from(marker) << 7) | 96;
    pkt[30..32].copy_from_slice(&sn.to_be_bytes());
    pkt[32..36].copy_from_slice(&ts.to_be_bytes());
    pkt[36..40].copy_from_slice(&ssrc.to_be_bytes());
    pkt
}

/// IPv6/UDP packet of exactly `total` bytes (`total >= 48`).
pub fn ipv6_udp_packet(total: usize) -> Vec<u8> {
    assert!(total >= 48);
    let mut pkt = vec![0u8; total];
    pkt[0] = 0x60;
    pkt[4..6].copy_from_slice(&((total - 40) as u16).to_be_bytes());
    pkt[6] = 17;
    pkt[7] = 64;
    pkt[8] = 0xFE;
    pkt[23] = 0x01;
    pkt[24] = 0xFE;
    pkt[39] = 0x02;
    pkt[40..42].copy_from_slice(&4000u16.to_be_bytes());
    pkt[42..44].copy_from_slice(&5000u16.to_be_bytes());
    pkt[44..46].copy_from_slice(&((total - 40) as u16).to_be_bytes());
    pkt
}

/// Small-CID compressor with a deterministic SN source and the given
/// profiles enabled.
pub fn compressor_with(profiles: &[RohcProfile]) -> RohcCompressor {
    let mut comp = RohcCompressor::new(CidType::Small, ContextId::new(15)).unwrap();
    comp.enable_profiles(profiles).unwrap();
    comp.set_random_fn(Box::new(|| 100)).unwrap();
    comp
}
