//! Compression throughput over steady flows.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rohcpress::{CidType, ContextId, RohcCompressor, RohcProfile};

fn ipv4_udp_packet(ip_id: u16) -> Vec<u8> {
    let mut pkt = vec![0u8; 128];
    pkt[0] = 0x45;
    pkt[2..4].copy_from_slice(&128u16.to_be_bytes());
    pkt[4..6].copy_from_slice(&ip_id.to_be_bytes());
    pkt[8] = 64;
    pkt[9] = 17;
    pkt[12..16].copy_from_slice(&[10, 0, 0, 1]);
    pkt[16..20].copy_from_slice(&[10, 0, 0, 2]);
    pkt[20..22].copy_from_slice(&1000u16.to_be_bytes());
    pkt[22..24].copy_from_slice(&2000u16.to_be_bytes());
    pkt[24..26].copy_from_slice(&108u16.to_be_bytes());
    pkt
}

fn bench_steady_udp_flow(c: &mut Criterion) {
    c.bench_function("compress_steady_udp_flow", |b| {
        let mut comp = RohcCompressor::new(CidType::Small, ContextId::new(15)).unwrap();
        comp.enable_profile(RohcProfile::Udp).unwrap();
        comp.set_random_fn(Box::new(|| 100)).unwrap();
        let mut out = [0u8; 256];
        let mut ip_id = 0u16;
        b.iter(|| {
            ip_id = ip_id.wrapping_add(1);
            let packet = ipv4_udp_packet(ip_id);
            black_box(comp.compress(None, &packet, &mut out).unwrap());
        });
    });
}

fn bench_context_establishment(c: &mut Criterion) {
    c.bench_function("compress_first_packet_ir", |b| {
        let packet = ipv4_udp_packet(1);
        let mut out = [0u8; 256];
        b.iter(|| {
            let mut comp = RohcCompressor::new(CidType::Small, ContextId::new(15)).unwrap();
            comp.enable_profile(RohcProfile::Udp).unwrap();
            comp.set_random_fn(Box::new(|| 100)).unwrap();
            black_box(comp.compress(None, &packet, &mut out).unwrap());
        });
    });
}

criterion_group!(benches, bench_steady_udp_flow, bench_context_establishment);
criterion_main!(benches);
