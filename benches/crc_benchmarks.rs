// ABOUTME: Benchmark suite for the CRC, frame codec, and register decoder
// ABOUTME: Measures throughput across payload sizes seen on the bus

use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use finitude::frame::{Address, AssembledFrame, Function, ParsedFrame};
use finitude::registers;
use std::time::Duration;

fn sample_payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 256) as u8).collect()
}

fn bench_crc_calculate(c: &mut Criterion) {
    let mut group = c.benchmark_group("crc_calculate");
    group.measurement_time(Duration::from_secs(10));

    for &size in &[0usize, 16, 64, 128, 255] {
        let data = sample_payload(size);
        group.bench_with_input(BenchmarkId::new("payload_len", size), &data, |b, data| {
            b.iter(|| finitude::crc::calculate(black_box(data)))
        });
    }

    group.finish();
}

fn bench_frame_assemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_assemble");
    group.measurement_time(Duration::from_secs(10));

    let dest = Address::from_hex_str("2001").unwrap();
    let source = Address::from_hex_str("3001").unwrap();

    for &size in &[0usize, 29, 120, 255] {
        let data = Bytes::from(sample_payload(size));
        group.bench_with_input(BenchmarkId::new("payload_len", size), &data, |b, data| {
            b.iter(|| AssembledFrame::new(dest, source, Function::Ack06 as u8, black_box(data.clone())).to_bytes())
        });
    }

    group.finish();
}

fn bench_frame_crc_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_crc_check");
    group.measurement_time(Duration::from_secs(10));

    let dest = Address::from_hex_str("2001").unwrap();
    let source = Address::from_hex_str("3001").unwrap();

    for &size in &[0usize, 29, 120, 255] {
        let bytes = AssembledFrame::new(dest, source, Function::Ack06 as u8, Bytes::from(sample_payload(size))).to_bytes();
        group.bench_with_input(BenchmarkId::new("payload_len", size), &bytes, |b, bytes| {
            b.iter(|| ParsedFrame::new(black_box(bytes.clone())).is_crc_valid())
        });
    }

    group.finish();
}

fn bench_register_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("register_decode");
    group.measurement_time(Duration::from_secs(10));

    let (name, specs) = registers::lookup("003b02").unwrap();
    let mut payload = vec![0x01, 0x00, 0x00];
    payload.extend([72, 73, 74, 75, 76, 77, 78, 79]);
    payload.extend([45u8; 8]);
    payload.push(0);
    payload.push(10);
    payload.push(0);
    payload.push(0x21);
    payload.extend([0u8; 5]);
    payload.push(0);

    group.bench_function("tstat_current_params", |b| {
        b.iter(|| registers::decode(black_box(name), specs, black_box(&payload)))
    });

    let (info_name, info_specs) = registers::lookup("000104").unwrap();
    let mut device_info = vec![0u8; 48 + 16 + 20 + 36];
    device_info[..12].copy_from_slice(b"InfinityUnit");
    group.bench_function("device_info", |b| {
        b.iter(|| registers::decode(black_box(info_name), info_specs, black_box(&device_info)))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_crc_calculate,
    bench_frame_assemble,
    bench_frame_crc_check,
    bench_register_decode
);
criterion_main!(benches);
