use super::*;
use crate::algorithm::Algorithm;
use crate::attributes::{KeyAttributes, KeyType, KeyUsage};
use crate::slots::KeyMaterial;
use tempfile::tempdir;

fn exercise_backend(storage: &dyn KeyStorage) {
    // Step 1: a missing uid reports DoesNotExist
    assert!(matches!(
        storage.get_info(7),
        Err(CryptoError::DoesNotExist { .. })
    ));
    assert!(!storage.exists(7).unwrap());

    // Step 2: set, then read back whole and partial
    storage.set(7, b"hello world", StorageFlags::empty()).unwrap();
    let info = storage.get_info(7).unwrap();
    assert_eq!(info.size, 11);
    assert_eq!(storage.get(7, 6, 5).unwrap().as_bytes(), b"world");
    assert_eq!(storage.get_all(7).unwrap().as_bytes(), b"hello world");

    // Step 3: out-of-range reads are rejected
    assert!(matches!(
        storage.get(7, 6, 6),
        Err(CryptoError::InvalidArgument { .. })
    ));

    // Step 4: overwrite and remove
    storage.set(7, b"bye", StorageFlags::empty()).unwrap();
    assert_eq!(storage.get_all(7).unwrap().as_bytes(), b"bye");
    storage.remove(7).unwrap();
    assert!(!storage.exists(7).unwrap());

    // Step 5: write-once entries can be neither replaced nor removed
    storage.set(9, b"seed", StorageFlags::WRITE_ONCE).unwrap();
    assert!(matches!(
        storage.set(9, b"other", StorageFlags::empty()),
        Err(CryptoError::NotPermitted { .. })
    ));
    assert!(matches!(
        storage.remove(9),
        Err(CryptoError::NotPermitted { .. })
    ));
    assert_eq!(storage.get_all(9).unwrap().as_bytes(), b"seed");
}

#[test]
fn test_memory_storage() {
    let storage = MemoryStorage::new();
    exercise_backend(&storage);
    assert_eq!(storage.len(), 1);
}

#[test]
fn test_file_storage() {
    let dir = tempdir().unwrap();
    let storage = FileStorage::open(dir.path().join("keys")).unwrap();
    exercise_backend(&storage);

    // A fresh handle on the same directory sees the same data
    let reopened = FileStorage::open(storage.root()).unwrap();
    assert_eq!(reopened.get_all(9).unwrap().as_bytes(), b"seed");
}

#[test]
fn test_key_format_round_trip() {
    let attrs = KeyAttributes::new()
        .with_type(KeyType::Aes)
        .with_bits(128)
        .with_usage(KeyUsage::ENCRYPT)
        .with_algorithm(Algorithm::Ctr)
        .with_id(5u32);
    let material = KeyMaterial::Raw(SecureBytes::new(&[0x11; 16]));

    let encoded = encode_key(&attrs, &material).unwrap();
    assert_eq!(&encoded.as_bytes()[..8], KEY_MAGIC);
    assert_eq!(&encoded.as_bytes()[8..12], &[0, 0, 0, 0]);

    let (decoded_attrs, decoded_material) = decode_key(5, encoded.as_bytes()).unwrap();
    assert_eq!(decoded_attrs, attrs);
    match decoded_material {
        KeyMaterial::Raw(bytes) => assert_eq!(bytes.as_bytes(), &[0x11; 16]),
        KeyMaterial::Opaque(_) => panic!("expected raw material"),
    }
}

#[test]
fn test_key_format_rejects_corruption() {
    assert!(matches!(
        decode_key(1, b"PSA\0KE"),
        Err(CryptoError::DataCorrupt { .. })
    ));

    let mut bad_version = KEY_MAGIC.to_vec();
    bad_version.extend_from_slice(&1u32.to_le_bytes());
    assert!(matches!(
        decode_key(1, &bad_version),
        Err(CryptoError::DataCorrupt { .. })
    ));

    let mut bad_body = KEY_MAGIC.to_vec();
    bad_body.extend_from_slice(&0u32.to_le_bytes());
    bad_body.extend_from_slice(&[0xff; 3]);
    assert!(matches!(
        decode_key(1, &bad_body),
        Err(CryptoError::DataInvalid { .. })
    ));
}
