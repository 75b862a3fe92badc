use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use boundary_core::constants::{DestinationType, HeaderType, PacketType, TransportType};
use boundary_core::framing::hdlc::{hdlc_frame, hdlc_unframe};
use boundary_core::packet::context::ContextType;
use boundary_core::packet::flags::PacketFlags;
use boundary_core::packet::wire::RawPacket;
use boundary_core::types::DestinationHash;

fn make_link_request(transport: bool) -> Vec<u8> {
    let header_type = if transport {
        HeaderType::Header2
    } else {
        HeaderType::Header1
    };
    let pkt = RawPacket {
        flags: PacketFlags {
            header_type,
            context_flag: false,
            transport_type: if transport {
                TransportType::Transport
            } else {
                TransportType::Broadcast
            },
            destination_type: DestinationType::Single,
            packet_type: PacketType::LinkRequest,
        },
        hops: 3,
        transport_id: transport.then(|| DestinationHash::new([0xCC; 16])),
        destination: DestinationHash::new([0xAA; 16]),
        context: ContextType::None,
        data: vec![0xBB; 67],
    };
    pkt.serialize().unwrap()
}

fn bench_packet(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet");

    let h1_raw = make_link_request(false);
    let h2_raw = make_link_request(true);
    let parsed = RawPacket::parse(&h2_raw).unwrap();

    group.bench_function("parse_header1", |b| {
        b.iter(|| RawPacket::parse(&h1_raw).unwrap());
    });
    group.bench_function("parse_header2", |b| {
        b.iter(|| RawPacket::parse(&h2_raw).unwrap());
    });
    group.bench_function("packet_hash", |b| {
        b.iter(|| parsed.packet_hash());
    });
    group.bench_function("link_id", |b| {
        b.iter(|| parsed.link_id());
    });

    group.finish();
}

fn bench_hdlc(c: &mut Criterion) {
    let mut group = c.benchmark_group("hdlc");

    for size in [64usize, 508, 1064] {
        let data: Vec<u8> = (0..size).map(|i| (i % 256) as u8).collect();
        let framed = hdlc_frame(&data);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("frame", size), &data, |b, d| {
            b.iter(|| hdlc_frame(d));
        });
        group.bench_with_input(BenchmarkId::new("unframe", size), &framed, |b, f| {
            b.iter(|| hdlc_unframe(f).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_packet, bench_hdlc);
criterion_main!(benches);
