// Property tests: chunking never changes results, normalization is stable

use proptest::prelude::*;
use qasa_psa::prelude::*;

const SHA256: Algorithm = Algorithm::Hash(HashAlgorithm::Sha256);

fn split_points(len: usize, cuts: &[usize]) -> Vec<usize> {
    let mut points: Vec<usize> = cuts.iter().map(|c| c % (len + 1)).collect();
    points.push(0);
    points.push(len);
    points.sort_unstable();
    points.dedup();
    points
}

fn usage_strategy() -> impl Strategy<Value = KeyUsage> {
    any::<u32>().prop_map(KeyUsage::from_bits_truncate)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn hash_chunking_matches_one_shot(
        data in proptest::collection::vec(any::<u8>(), 0..512),
        cuts in proptest::collection::vec(any::<usize>(), 0..8),
    ) {
        let core = CryptoCore::new(CoreConfig::default()).unwrap();
        let mut expected = [0u8; 32];
        core.hash_compute(SHA256, &data, &mut expected).unwrap();

        let mut op = HashOperation::new();
        op.setup(&core, SHA256).unwrap();
        let points = split_points(data.len(), &cuts);
        for window in points.windows(2) {
            op.update(&data[window[0]..window[1]]).unwrap();
        }
        let mut digest = [0u8; 32];
        op.finish(&mut digest).unwrap();
        prop_assert_eq!(digest, expected);
    }

    #[test]
    fn ctr_chunking_matches_one_shot(
        data in proptest::collection::vec(any::<u8>(), 0..256),
        cuts in proptest::collection::vec(any::<usize>(), 0..8),
        key in proptest::array::uniform16(any::<u8>()),
    ) {
        let core = CryptoCore::new(CoreConfig::default()).unwrap();
        let attrs = KeyAttributes::new()
            .with_type(KeyType::Aes)
            .with_usage(KeyUsage::ENCRYPT | KeyUsage::DECRYPT)
            .with_algorithm(Algorithm::Ctr);
        let key = core.import_key(&attrs, &key).unwrap();

        let mut one_shot = vec![0u8; 16 + data.len()];
        core.cipher_encrypt(key, Algorithm::Ctr, &data, &mut one_shot).unwrap();
        let (iv, expected) = one_shot.split_at(16);

        let mut op = CipherOperation::new();
        op.encrypt_setup(&core, key, Algorithm::Ctr).unwrap();
        op.set_iv(iv).unwrap();
        let mut out = vec![0u8; data.len()];
        let mut written = 0;
        let points = split_points(data.len(), &cuts);
        for window in points.windows(2) {
            written += op.update(&data[window[0]..window[1]], &mut out[written..]).unwrap();
        }
        written += op.finish(&mut out[written..]).unwrap();
        prop_assert_eq!(written, data.len());
        prop_assert_eq!(&out[..], expected);
    }

    #[test]
    fn hkdf_output_chunking_is_invisible(
        secret in proptest::collection::vec(any::<u8>(), 1..64),
        cuts in proptest::collection::vec(any::<usize>(), 0..6),
    ) {
        let core = CryptoCore::new(CoreConfig::default()).unwrap();
        let derive = |points: &[usize]| {
            let mut op = KeyDerivationOperation::new();
            op.setup(&core, Algorithm::Hkdf(HashAlgorithm::Sha256)).unwrap();
            op.input_bytes(DerivationStep::Secret, &secret).unwrap();
            op.input_bytes(DerivationStep::Info, b"context").unwrap();
            let mut out = [0u8; 100];
            for window in points.windows(2) {
                op.output_bytes(&mut out[window[0]..window[1]]).unwrap();
            }
            out
        };
        let whole = derive(&[0, 100]);
        let chunked = derive(&split_points(100, &cuts));
        prop_assert_eq!(whole.to_vec(), chunked.to_vec());
    }

    #[test]
    fn usage_normalization_is_idempotent(usage in usage_strategy()) {
        let once = usage.normalized();
        prop_assert_eq!(once.normalized(), once);
        prop_assert!(once.contains(usage));
    }

    #[test]
    fn attributes_store_normalized_usage(usage in usage_strategy()) {
        let attrs = KeyAttributes::new().with_usage(usage);
        prop_assert_eq!(attrs.usage(), usage.normalized());
    }
}

#[test]
fn sign_hash_implies_sign_message() {
    let usage = KeyUsage::SIGN_HASH.normalized();
    assert!(usage.contains(KeyUsage::SIGN_MESSAGE));
    let usage = KeyUsage::VERIFY_HASH.normalized();
    assert!(usage.contains(KeyUsage::VERIFY_MESSAGE));
    assert_eq!(KeyUsage::SIGN_MESSAGE.normalized(), KeyUsage::SIGN_MESSAGE);
}
