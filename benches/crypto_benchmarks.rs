use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use qasa_psa::prelude::*;

const SIZES: [usize; 3] = [64, 1024, 16 * 1024];

fn bench_core() -> CryptoCore {
    CryptoCore::new(CoreConfig {
        rng: RngConfig::Pseudo { seed: 0x5eed },
        ..CoreConfig::default()
    })
    .unwrap()
}

fn symmetric_key(core: &CryptoCore, key_type: KeyType, alg: Algorithm, len: usize) -> KeyId {
    let attrs = KeyAttributes::new()
        .with_type(key_type)
        .with_usage(KeyUsage::ENCRYPT | KeyUsage::DECRYPT | KeyUsage::SIGN_MESSAGE)
        .with_algorithm(alg);
    core.import_key(&attrs, &vec![0x42u8; len]).unwrap()
}

fn hash_benchmarks(c: &mut Criterion) {
    let core = bench_core();
    let mut group = c.benchmark_group("hash");

    for hash in [HashAlgorithm::Sha256, HashAlgorithm::Sha512, HashAlgorithm::Sha3_256] {
        let alg = Algorithm::Hash(hash);
        for size in SIZES {
            let data = vec![0xa5u8; size];
            let mut digest = [0u8; 64];
            group.throughput(Throughput::Bytes(size as u64));
            group.bench_with_input(BenchmarkId::new(format!("{:?}", hash), size), &data, |b, data| {
                b.iter(|| core.hash_compute(alg, data, &mut digest).unwrap())
            });
        }
    }

    // Multi-part cost on top of the one-shot path
    let data = vec![0xa5u8; 16 * 1024];
    group.bench_function("Sha256/multi_part_1k_chunks", |b| {
        b.iter(|| {
            let mut op = HashOperation::new();
            op.setup(&core, Algorithm::Hash(HashAlgorithm::Sha256)).unwrap();
            for chunk in data.chunks(1024) {
                op.update(chunk).unwrap();
            }
            let mut digest = [0u8; 32];
            op.finish(&mut digest).unwrap()
        })
    });

    group.finish();
}

fn cipher_benchmarks(c: &mut Criterion) {
    let core = bench_core();
    let mut group = c.benchmark_group("cipher");
    let ciphers = [
        ("aes256_ctr", KeyType::Aes, Algorithm::Ctr, 32),
        ("aes128_cbc_pkcs7", KeyType::Aes, Algorithm::CbcPkcs7, 16),
        ("chacha20", KeyType::ChaCha20, Algorithm::StreamCipher, 32),
    ];

    for (name, key_type, alg, key_len) in ciphers {
        let key = symmetric_key(&core, key_type, alg, key_len);
        for size in SIZES {
            let data = vec![0u8; size];
            let mut out = vec![0u8; size + 32];
            group.throughput(Throughput::Bytes(size as u64));
            group.bench_with_input(BenchmarkId::new(name, size), &data, |b, data| {
                b.iter(|| core.cipher_encrypt(key, alg, data, &mut out).unwrap())
            });
        }
    }
    group.finish();
}

fn aead_benchmarks(c: &mut Criterion) {
    let core = bench_core();
    let mut group = c.benchmark_group("aead");
    let aeads = [
        ("aes256_gcm", KeyType::Aes, Algorithm::Gcm),
        ("chacha20_poly1305", KeyType::ChaCha20, Algorithm::ChaCha20Poly1305),
    ];

    for (name, key_type, alg) in aeads {
        let key = symmetric_key(&core, key_type, alg, 32);
        let nonce = [7u8; 12];
        for size in SIZES {
            let data = vec![0u8; size];
            let mut out = vec![0u8; size + 16];
            group.throughput(Throughput::Bytes(size as u64));
            group.bench_with_input(BenchmarkId::new(name, size), &data, |b, data| {
                b.iter(|| core.aead_encrypt(key, alg, &nonce, b"header", data, &mut out).unwrap())
            });
        }
    }
    group.finish();
}

fn key_benchmarks(c: &mut Criterion) {
    let core = bench_core();
    let mut group = c.benchmark_group("keys");

    let aes = KeyAttributes::new()
        .with_type(KeyType::Aes)
        .with_bits(256)
        .with_usage(KeyUsage::ENCRYPT)
        .with_algorithm(Algorithm::Ctr);
    group.bench_function("aes256_generate_destroy", |b| {
        b.iter(|| {
            let key = core.generate_key(&aes).unwrap();
            core.destroy_key(key).unwrap()
        })
    });

    let x25519 = KeyAttributes::new()
        .with_type(KeyType::EccKeyPair(EccFamily::Montgomery))
        .with_bits(255)
        .with_usage(KeyUsage::DERIVE)
        .with_algorithm(Algorithm::Ecdh);
    let alice = core.generate_key(&x25519).unwrap();
    let bob = core.generate_key(&x25519).unwrap();
    let mut bob_public = [0u8; 32];
    core.export_public_key(bob, &mut bob_public).unwrap();
    group.bench_function("x25519_agreement", |b| {
        let mut shared = [0u8; 32];
        b.iter(|| {
            core.raw_key_agreement(Algorithm::Ecdh, alice, &bob_public, &mut shared)
                .unwrap()
        })
    });

    let ed25519 = KeyAttributes::new()
        .with_type(KeyType::EccKeyPair(EccFamily::TwistedEdwards))
        .with_bits(255)
        .with_usage(KeyUsage::SIGN_MESSAGE | KeyUsage::VERIFY_MESSAGE)
        .with_algorithm(Algorithm::PureEddsa);
    let signer = core.generate_key(&ed25519).unwrap();
    let message = [0x11u8; 256];
    let mut signature = [0u8; 64];
    core.sign_message(signer, Algorithm::PureEddsa, &message, &mut signature)
        .unwrap();
    group.bench_function("ed25519_sign", |b| {
        let mut out = [0u8; 64];
        b.iter(|| core.sign_message(signer, Algorithm::PureEddsa, &message, &mut out).unwrap())
    });
    group.bench_function("ed25519_verify", |b| {
        b.iter(|| core.verify_message(signer, Algorithm::PureEddsa, &message, &signature).unwrap())
    });

    group.finish();
}

fn kdf_benchmarks(c: &mut Criterion) {
    let core = bench_core();
    let mut group = c.benchmark_group("key_derivation");

    group.bench_function("hkdf_sha256_64_bytes", |b| {
        b.iter(|| {
            let mut op = KeyDerivationOperation::new();
            op.setup(&core, Algorithm::Hkdf(HashAlgorithm::Sha256)).unwrap();
            op.input_bytes(DerivationStep::Salt, b"salt").unwrap();
            op.input_bytes(DerivationStep::Secret, &[0x0b; 32]).unwrap();
            op.input_bytes(DerivationStep::Info, b"bench").unwrap();
            let mut out = [0u8; 64];
            op.output_bytes(&mut out).unwrap();
            out
        })
    });

    group.sample_size(10);
    group.bench_function("pbkdf2_sha256_1000_rounds", |b| {
        b.iter(|| {
            let mut op = KeyDerivationOperation::new();
            op.setup(&core, Algorithm::Pbkdf2Hmac(HashAlgorithm::Sha256)).unwrap();
            op.input_integer(DerivationStep::Cost, 1000).unwrap();
            op.input_bytes(DerivationStep::Salt, b"salt").unwrap();
            op.input_bytes(DerivationStep::Password, b"password").unwrap();
            let mut out = [0u8; 32];
            op.output_bytes(&mut out).unwrap();
            out
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    hash_benchmarks,
    cipher_benchmarks,
    aead_benchmarks,
    key_benchmarks,
    kdf_benchmarks
);
criterion_main!(benches);
