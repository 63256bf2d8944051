//! Profile selection across the registry's priority order.

mod common;

use common::{compressor_with, ipv4_icmp_packet, ipv4_udp_packet, rtp_packet};
use rohcpress::{CompressOutcome, CompressionError, PacketType, RohcError, RohcProfile};

#[test]
fn rtp_wins_over_udp_for_listed_ports() {
    let mut comp = compressor_with(&[RohcProfile::Rtp, RohcProfile::Udp]);
    comp.add_rtp_port(5004).unwrap();

    let mut out = [0u8; 256];
    comp.compress(None, &rtp_packet(5004, 100, 1000, 0xDEADBEEF, false), &mut out)
        .unwrap();
    assert_eq!(comp.last_packet_info().unwrap().profile, RohcProfile::Rtp);
}

#[test]
fn unlisted_port_falls_through_to_udp() {
    let mut comp = compressor_with(&[RohcProfile::Rtp, RohcProfile::Udp]);
    comp.add_rtp_port(5004).unwrap();

    let mut out = [0u8; 256];
    comp.compress(None, &rtp_packet(9000, 100, 1000, 0xDEADBEEF, false), &mut out)
        .unwrap();
    assert_eq!(comp.last_packet_info().unwrap().profile, RohcProfile::Udp);
}

#[test]
fn removed_rtp_port_downgrades_to_udp_and_destroys_context() {
    let mut comp = compressor_with(&[RohcProfile::Rtp, RohcProfile::Udp]);
    comp.add_rtp_port(1234).unwrap();
    comp.add_rtp_port(5004).unwrap();

    let mut out = [0u8; 256];
    comp.compress(None, &rtp_packet(1234, 1, 160, 0xABCD, false), &mut out)
        .unwrap();
    assert_eq!(comp.last_packet_info().unwrap().profile, RohcProfile::Rtp);
    assert_eq!(comp.contexts_used(), 1);

    // Removing the port destroys the context that was using it.
    comp.remove_rtp_port(1234).unwrap();
    assert_eq!(comp.contexts_used(), 0);

    comp.compress(None, &rtp_packet(1234, 2, 320, 0xABCD, false), &mut out)
        .unwrap();
    assert_eq!(comp.last_packet_info().unwrap().profile, RohcProfile::Udp);
}

#[test]
fn ip_profile_catches_non_transport_flows() {
    let mut comp = compressor_with(&[
        RohcProfile::Rtp,
        RohcProfile::Udp,
        RohcProfile::Ip,
        RohcProfile::Uncompressed,
    ]);
    let mut out = [0u8; 256];
    comp.compress(None, &ipv4_icmp_packet(1, 64), &mut out).unwrap();
    assert_eq!(comp.last_packet_info().unwrap().profile, RohcProfile::Ip);
}

#[test]
fn uncompressed_only_emits_normal_packets() {
    let mut comp = compressor_with(&[RohcProfile::Uncompressed]);
    let packet = ipv4_icmp_packet(7, 64);
    let mut out = [0u8; 256];
    let CompressOutcome::Packet(len) = comp.compress(None, &packet, &mut out).unwrap() else {
        panic!("expected a complete packet");
    };
    assert_eq!(out[0], 0b1111_1100);
    assert_eq!(len, packet.len() + 1);
    assert_eq!(&out[1..len], packet.as_slice());
    assert_eq!(comp.last_packet_info().unwrap().packet_type, PacketType::Normal);
}

#[test]
fn udp_lite_and_esp_have_their_own_profiles() {
    let mut comp = compressor_with(&[
        RohcProfile::UdpLite,
        RohcProfile::Esp,
        RohcProfile::Ip,
    ]);
    let mut out = [0u8; 256];

    let mut udp_lite = ipv4_udp_packet(3000, 4000, 1, 8);
    udp_lite[9] = 136;
    comp.compress(None, &udp_lite, &mut out).unwrap();
    assert_eq!(comp.last_packet_info().unwrap().profile, RohcProfile::UdpLite);

    let mut esp = ipv4_udp_packet(0, 0, 1, 8);
    esp[9] = 50;
    esp[20..24].copy_from_slice(&0x11223344u32.to_be_bytes());
    esp[24..28].copy_from_slice(&1u32.to_be_bytes());
    comp.compress(None, &esp, &mut out).unwrap();
    assert_eq!(comp.last_packet_info().unwrap().profile, RohcProfile::Esp);
}

#[test]
fn fragmented_packets_fall_back_to_uncompressed() {
    let mut comp = compressor_with(&[RohcProfile::Ip, RohcProfile::Uncompressed]);
    let mut fragment = ipv4_icmp_packet(1, 64);
    fragment[6] = 0x20; // more fragments
    let mut out = [0u8; 256];
    comp.compress(None, &fragment, &mut out).unwrap();
    assert_eq!(
        comp.last_packet_info().unwrap().profile,
        RohcProfile::Uncompressed
    );
}

#[test]
fn no_enabled_profile_is_an_error() {
    let mut comp = compressor_with(&[RohcProfile::Udp]);
    // ICMP is not UDP; only the UDP profile is enabled.
    let mut out = [0u8; 256];
    let err = comp.compress(None, &ipv4_icmp_packet(1, 64), &mut out).unwrap_err();
    assert!(matches!(
        err,
        RohcError::Compression(CompressionError::NoProfileFound { protocol: 1 })
    ));
}

#[test]
fn tcp_profile_cannot_be_enabled() {
    let mut comp = compressor_with(&[RohcProfile::Ip]);
    assert!(comp.enable_profile(RohcProfile::Tcp).is_err());
    assert!(comp.enable_profile(RohcProfile::Unknown(0x1234)).is_err());
}
