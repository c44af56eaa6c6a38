//! # Interchain Accounts Benchmarks
//!
//! | Path | Measured |
//! |------|----------|
//! | Address derivation | `generate_address` per owner |
//! | Metadata codec | encode + decode of a channel version |
//! | Packet round trip | send → receive → execute → acknowledge |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use qc_15_interchain_accounts::adapters::MsgSend;
use qc_15_interchain_accounts::{generate_address, Encoding, Metadata, TxType};
use qc_tests::integration::harness::{IcaHarness, HOST_CONNECTION};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::time::Duration;

fn bench_address_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-15-address");

    let owners: Vec<String> = (0..256)
        .map(|_| {
            rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(32)
                .map(char::from)
                .collect()
        })
        .collect();

    group.throughput(Throughput::Elements(owners.len() as u64));
    group.bench_function("generate_address_batch", |b| {
        b.iter(|| {
            for owner in &owners {
                let port = IcaHarness::port_of(owner);
                black_box(generate_address("qc", HOST_CONNECTION, &port));
            }
        })
    });
    group.finish();
}

fn bench_metadata_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-15-metadata");
    let metadata = Metadata::new(
        "ics27-1",
        "connection-0",
        HOST_CONNECTION,
        generate_address("qc", HOST_CONNECTION, "icacontroller-alice"),
        Encoding::Bincode,
        TxType::MultiMsg,
    );

    group.bench_function("encode_decode", |b| {
        b.iter(|| {
            let version = metadata.encode().unwrap();
            black_box(Metadata::decode(&version).unwrap())
        })
    });
    group.finish();
}

fn bench_packet_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-15-packet");
    group.measurement_time(Duration::from_secs(10));

    for batch in [1usize, 10, 50] {
        let harness = IcaHarness::new();
        let account = harness.open_account("bench").unwrap();
        harness.fund(&account.address, u128::MAX / 2).unwrap();
        let msgs: Vec<_> = (0..batch)
            .map(|i| {
                MsgSend::new(&account.address, format!("qc1dest{}", i), 1)
                    .to_any()
                    .unwrap()
            })
            .collect();

        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::new("send_relay_ack", batch), &msgs, |b, msgs| {
            b.iter(|| {
                let packet = harness.send_msgs("bench", msgs).unwrap();
                black_box(harness.relay_packet(&packet).unwrap())
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_address_derivation,
    bench_metadata_codec,
    bench_packet_round_trip
);
criterion_main!(benches);
