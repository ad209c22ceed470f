// Codec and envelope benchmarks for the Keyward ceremony engine.
//
// Covers split/combine at representative (k, n) parameters and secret
// sizes, plus the per-keeper envelope seal/open cost (dominated by
// PBKDF2, which is the point of PBKDF2).

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use keyward_ceremony::crypto::envelope::{open_share, seal_share};
use keyward_ceremony::crypto::shamir::{combine, split, Share};
use keyward_ceremony::crypto::SealedBytes;

fn bench_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("shamir/split");
    for &size in &[32usize, 256, 1024] {
        let secret = vec![0xA5u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("3of5", size), &secret, |b, secret| {
            b.iter(|| split(secret, 3, 5).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("8of12", size), &secret, |b, secret| {
            b.iter(|| split(secret, 8, 12).unwrap());
        });
    }
    group.finish();
}

fn bench_combine(c: &mut Criterion) {
    let mut group = c.benchmark_group("shamir/combine");
    for &size in &[32usize, 1024] {
        let secret = vec![0x5Au8; size];
        let shares: Vec<Share> = split(&secret, 3, 5).unwrap();
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("3of5", size), &shares, |b, shares| {
            b.iter(|| combine(&shares[..3], 3).unwrap());
        });
    }
    group.finish();
}

fn bench_envelope(c: &mut Criterion) {
    let share = Share {
        x: 1,
        y: vec![0xC3u8; 32],
    };
    let password = SealedBytes::from_string("benchmark-password-1".to_string(), 1);
    // The minimum accepted iteration count; production uses 100k and
    // scales linearly.
    let iterations = 10_000;

    c.bench_function("envelope/seal_10k_iters", |b| {
        b.iter(|| seal_share(&share, &password, iterations).unwrap());
    });

    let envelope = seal_share(&share, &password, iterations).unwrap();
    c.bench_function("envelope/open_10k_iters", |b| {
        b.iter(|| open_share(&envelope, &password, iterations).unwrap());
    });
}

criterion_group!(benches, bench_split, bench_combine, bench_envelope);
criterion_main!(benches);
