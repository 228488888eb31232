//! Criterion benchmarks for PayStream crypto: key derivation, ECDH, view tags, stealth derivation.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use paystream_core::SecretScalar;
use paystream_crypto::derive;
use paystream_crypto::{compute_view_tag, derive_keys, hash_shared_secret, shared_secret};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

fn signature() -> [u8; 65] {
    let mut sig = [0x42u8; 65];
    sig[64] = 27;
    sig
}

fn bench_key_derivation(c: &mut Criterion) {
    let sig = signature();
    let mut g = c.benchmark_group("key_derivation");
    g.throughput(Throughput::Elements(1));
    g.bench_function("derive_keys", |b| {
        b.iter(|| black_box(derive_keys(&sig, "stealth-keys")).unwrap());
    });
    g.finish();
}

fn bench_ecdh(c: &mut Criterion) {
    let mut rng = ChaCha20Rng::seed_from_u64(1);
    let ephemeral = SecretScalar::random(&mut rng);
    let viewing = SecretScalar::random(&mut rng).public_point();
    let mut g = c.benchmark_group("ecdh");
    g.throughput(Throughput::Elements(1));
    g.bench_function("shared_secret", |b| {
        b.iter(|| black_box(shared_secret(&ephemeral, &viewing)).unwrap());
    });
    g.finish();
}

fn bench_view_tag(c: &mut Criterion) {
    let mut rng = ChaCha20Rng::seed_from_u64(2);
    let s = SecretScalar::random(&mut rng).public_point();
    let mut g = c.benchmark_group("view_tag");
    g.throughput(Throughput::Elements(1));
    g.bench_function("compute_view_tag", |b| {
        b.iter(|| black_box(compute_view_tag(&s)));
    });
    g.finish();
}

fn bench_stealth_derivation(c: &mut Criterion) {
    let mut rng = ChaCha20Rng::seed_from_u64(3);
    let spending = SecretScalar::random(&mut rng);
    let spending_pk = spending.public_point();
    let s = SecretScalar::random(&mut rng).public_point();
    let hashed = hash_shared_secret(&s);

    let mut g = c.benchmark_group("stealth_derivation");
    g.throughput(Throughput::Elements(1));
    g.bench_function("derive_stealth_address", |b| {
        b.iter(|| black_box(derive::derive_stealth_address(&spending_pk, &s)).unwrap());
    });
    g.bench_function("derive_stealth_keys_from_hash", |b| {
        b.iter(|| black_box(derive::derive_stealth_keys_from_hash(&spending, &hashed)).unwrap());
    });
    g.finish();
}

criterion_group!(
    benches,
    bench_key_derivation,
    bench_ecdh,
    bench_view_tag,
    bench_stealth_derivation
);
criterion_main!(benches);
