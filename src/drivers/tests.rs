use super::*;
use crate::algorithm::HashAlgorithm;
use crate::attributes::{Persistence, KeyType};

fn table(accelerator: bool) -> (DriverTable, Arc<TestDriverHooks>) {
    let hooks = Arc::new(TestDriverHooks::new());
    let mut entries: Vec<Arc<dyn CryptoDriver>> = Vec::new();
    if accelerator {
        entries.push(Arc::new(TransparentTestDriver::new(Arc::clone(&hooks))));
    }
    entries.push(Arc::new(BuiltinDriver::new()));
    entries.push(Arc::new(OpaqueTestDriver::new(Arc::clone(&hooks))));
    (DriverTable::new(entries), hooks)
}

#[test]
fn test_local_resolves_to_builtin() {
    let (table, _) = table(false);
    let entry = table
        .resolve(AlgorithmCategory::Cipher, Algorithm::Ctr, Location::LOCAL_STORAGE)
        .unwrap();
    assert_eq!(entry.index, 0);
    assert_eq!(entry.driver.name(), "builtin");
}

#[test]
fn test_accelerator_is_preferred_when_registered() {
    let (table, _) = table(true);
    let entry = table
        .resolve(AlgorithmCategory::Hash, Algorithm::Hash(HashAlgorithm::Sha256), Location::LOCAL_STORAGE)
        .unwrap();
    assert_eq!(entry.driver.name(), "test-accelerator");
}

#[test]
fn test_resolution_is_deterministic() {
    let (table, _) = table(true);
    let first = table
        .resolve(AlgorithmCategory::Aead, Algorithm::Gcm, Location::LOCAL_STORAGE)
        .unwrap();
    for _ in 0..16 {
        let again = table
            .resolve(AlgorithmCategory::Aead, Algorithm::Gcm, Location::LOCAL_STORAGE)
            .unwrap();
        assert_eq!(again.index, first.index);
    }
}

#[test]
fn test_opaque_location_resolves_to_opaque_driver() {
    let (table, _) = table(true);
    let entry = table
        .resolve(AlgorithmCategory::Sign, Algorithm::PureEddsa, Location::TEST_DRIVER)
        .unwrap();
    assert_eq!(entry.driver.kind(), DriverKind::Opaque);
    assert_eq!(entry.driver.name(), "test-opaque");
}

#[test]
fn test_unsupported_combinations() {
    let (table, _) = table(false);
    let err = table
        .resolve(
            AlgorithmCategory::Sign,
            Algorithm::Ecdsa(HashAlgorithm::Sha256),
            Location::LOCAL_STORAGE,
        )
        .unwrap_err();
    assert!(matches!(err, CryptoError::NotSupported { .. }));
    assert!(!err.is_retryable());

    let err = table
        .resolve(AlgorithmCategory::Cipher, Algorithm::Ctr, Location(0x12_3456))
        .unwrap_err();
    assert!(matches!(err, CryptoError::NotSupported { .. }));

    // Hashes never run on an opaque driver
    let err = table
        .resolve(
            AlgorithmCategory::Hash,
            Algorithm::Hash(HashAlgorithm::Sha256),
            Location::TEST_DRIVER,
        )
        .unwrap_err();
    assert!(matches!(err, CryptoError::NotSupported { .. }));
}

#[test]
fn test_category_mismatch_is_invalid_argument() {
    let (table, _) = table(false);
    let err = table
        .resolve(AlgorithmCategory::Mac, Algorithm::Ctr, Location::LOCAL_STORAGE)
        .unwrap_err();
    assert!(matches!(err, CryptoError::InvalidArgument { .. }));
}

#[test]
fn test_table_loads_builtin_keys_from_owning_driver() {
    let (table, hooks) = table(false);
    let lifetime = Lifetime::new(Persistence::READ_ONLY, Location::TEST_DRIVER);
    let (attributes, material) = table
        .load_builtin_key(KeyId(KeyId::BUILTIN_MIN), lifetime, 0)
        .unwrap();
    assert_eq!(attributes.key_type(), KeyType::Aes);
    assert_eq!(attributes.bits(), 128);
    assert!(material.is_opaque());
    assert_eq!(hooks.hits(HookCategory::KeyManagement), 1);

    let err = table
        .load_builtin_key(KeyId(KeyId::BUILTIN_MIN), Lifetime::new(Persistence::READ_ONLY, Location(0x42)), 0)
        .unwrap_err();
    assert!(matches!(err, CryptoError::DoesNotExist { .. }));
}

#[test]
fn test_default_sign_message_hashes_first() {
    // A driver that only implements sign_hash still signs messages
    struct EchoSigner;

    impl CryptoDriver for EchoSigner {
        fn name(&self) -> &'static str {
            "echo"
        }
        fn kind(&self) -> DriverKind {
            DriverKind::Transparent
        }
        fn location(&self) -> Location {
            Location::LOCAL_STORAGE
        }
        fn supports(&self, _alg: Algorithm) -> bool {
            true
        }
        fn sign_hash(
            &self,
            _attributes: &KeyAttributes,
            _material: &KeyMaterial,
            _alg: Algorithm,
            hash: &[u8],
            _rng: &mut dyn RandomSource,
        ) -> CryptoResult<Vec<u8>> {
            Ok(hash.to_vec())
        }
    }

    let attrs = KeyAttributes::new();
    let material = KeyMaterial::Raw(SecureBytes::new(&[1]));
    let mut rng = crate::rng::ZeroRandom;
    let sig = EchoSigner
        .sign_message(&attrs, &material, Algorithm::RsaPss(HashAlgorithm::Sha256), b"abc", &mut rng)
        .unwrap();
    assert_eq!(sig, builtin::hash::compute(HashAlgorithm::Sha256, b"abc").unwrap());

    let err = EchoSigner
        .hash_setup(HashAlgorithm::Sha256)
        .err()
        .unwrap();
    assert!(matches!(err, CryptoError::NotSupported { .. }));
}

#[test]
fn test_routes_match_registration_order() {
    let (table, _) = table(true);
    for alg in Algorithm::all() {
        for location in [Location::LOCAL_STORAGE, Location::TEST_DRIVER] {
            let expected = table.entries().iter().position(|driver| {
                let owns = if location.is_local() {
                    driver.kind() == DriverKind::Transparent
                } else {
                    driver.kind() == DriverKind::Opaque && driver.location() == location
                };
                owns && driver.supports(alg)
            });
            let resolved = table.resolve(alg.category(), alg, location).ok().map(|e| e.index);
            assert_eq!(resolved, expected, "{} at {:#x}", alg, location.0);
        }
    }
    assert_eq!(table.for_location(Location::LOCAL_STORAGE).unwrap().index, 0);
    assert_eq!(table.for_location(Location::TEST_DRIVER).unwrap().driver.name(), "test-opaque");
}
