// Known-answer and round-trip tests for the symmetric ciphers

use qasa_psa::client::cipher_encrypt_output_size;
use qasa_psa::prelude::*;

fn import(core: &CryptoCore, key_type: KeyType, alg: Algorithm, key: &[u8]) -> KeyId {
    let attrs = KeyAttributes::new()
        .with_type(key_type)
        .with_usage(KeyUsage::ENCRYPT | KeyUsage::DECRYPT)
        .with_algorithm(alg);
    core.import_key(&attrs, key).unwrap()
}

#[test]
fn test_aes256_ctr_round_trip() {
    let core = CryptoCore::new(CoreConfig::default()).unwrap();
    let key = import(&core, KeyType::Aes, Algorithm::Ctr, &[0x60; 32]);

    for len in [0usize, 1, 64] {
        let plaintext: Vec<u8> = (0..len).map(|i| i as u8).collect();
        let mut ciphertext = vec![0u8; cipher_encrypt_output_size(Algorithm::Ctr, len)];
        let written = core
            .cipher_encrypt(key, Algorithm::Ctr, &plaintext, &mut ciphertext)
            .unwrap();
        assert_eq!(written, 16 + len);

        let mut recovered = vec![0u8; len];
        let n = core
            .cipher_decrypt(key, Algorithm::Ctr, &ciphertext[..written], &mut recovered)
            .unwrap();
        assert_eq!(n, len);
        assert_eq!(recovered, plaintext);
    }
}

#[test]
fn test_aes128_ctr_nist_vector() {
    // NIST SP 800-38A F.5.1
    let core = CryptoCore::new(CoreConfig::default()).unwrap();
    let key = hex::decode("2b7e151628aed2a6abf7158809cf4f3c").unwrap();
    let key = import(&core, KeyType::Aes, Algorithm::Ctr, &key);
    let iv = hex::decode("f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff").unwrap();
    let plaintext = hex::decode("6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51").unwrap();

    let mut op = CipherOperation::new();
    op.encrypt_setup(&core, key, Algorithm::Ctr).unwrap();
    op.set_iv(&iv).unwrap();
    let mut ciphertext = vec![0u8; plaintext.len()];
    let n = op.update(&plaintext, &mut ciphertext).unwrap();
    op.finish(&mut ciphertext[n..]).unwrap();
    assert_eq!(
        hex::encode(&ciphertext),
        "874d6191b620e3261bef6864990db6ce9806f66b7970fdff8617187bb9fffdff"
    );
}

#[test]
fn test_cbc_pkcs7_padding() {
    let core = CryptoCore::new(CoreConfig::default()).unwrap();
    let key = import(&core, KeyType::Aes, Algorithm::CbcPkcs7, &[9u8; 16]);

    for len in [0usize, 15, 16, 17] {
        let plaintext = vec![0x33u8; len];
        let size = cipher_encrypt_output_size(Algorithm::CbcPkcs7, len);
        assert_eq!(size, 16 + (len / 16 + 1) * 16);
        let mut ciphertext = vec![0u8; size];
        let written = core
            .cipher_encrypt(key, Algorithm::CbcPkcs7, &plaintext, &mut ciphertext)
            .unwrap();
        assert_eq!(written, size);

        let mut recovered = vec![0u8; size];
        let n = core
            .cipher_decrypt(key, Algorithm::CbcPkcs7, &ciphertext, &mut recovered)
            .unwrap();
        assert_eq!(&recovered[..n], &plaintext[..]);
    }
}

#[test]
fn test_cbc_no_padding_rejects_partial_block() {
    let core = CryptoCore::new(CoreConfig::default()).unwrap();
    let key = import(&core, KeyType::Aes, Algorithm::CbcNoPadding, &[9u8; 16]);
    let mut out = [0u8; 64];
    assert!(core
        .cipher_encrypt(key, Algorithm::CbcNoPadding, &[1u8; 17], &mut out)
        .is_err());
    assert_eq!(core.stats().locked_slots, 0);
}

#[test]
fn test_chacha20_keystream_byte_by_byte() {
    // RFC 8439 A.1, test vector 1: all-zero key and nonce, counter 0
    let core = CryptoCore::new(CoreConfig::default()).unwrap();
    let key = import(&core, KeyType::ChaCha20, Algorithm::StreamCipher, &[0u8; 32]);

    let mut op = CipherOperation::new();
    op.encrypt_setup(&core, key, Algorithm::StreamCipher).unwrap();
    op.set_iv(&[0u8; 12]).unwrap();
    let mut keystream = [0u8; 64];
    for i in 0..64 {
        assert_eq!(op.update(&[0u8], &mut keystream[i..i + 1]).unwrap(), 1);
    }
    assert_eq!(op.finish(&mut []).unwrap(), 0);
    assert_eq!(
        hex::encode(keystream),
        "76b8e0ada0f13d90405d6ae55386bd28bdd219b8a08ded1aa836efcc8b770dc7\
         da41597c5157488d7724e03fb8d84a376a43b8f41518a11cc387b669b2ee6586"
    );
}

#[test]
fn test_chacha20_poly1305_rfc8439_vector() {
    // RFC 8439 2.8.2
    let core = CryptoCore::new(CoreConfig::default()).unwrap();
    let key = hex::decode("808182838485868788898a8b8c8d8e8f909192939495969798999a9b9c9d9e9f").unwrap();
    let key = import(&core, KeyType::ChaCha20, Algorithm::ChaCha20Poly1305, &key);
    let nonce = hex::decode("070000004041424344454647").unwrap();
    let ad = hex::decode("50515253c0c1c2c3c4c5c6c7").unwrap();
    let plaintext = b"Ladies and Gentlemen of the class of '99: If I could offer you only one tip for the future, sunscreen would be it.";

    let mut sealed = vec![0u8; plaintext.len() + 16];
    core.aead_encrypt(key, Algorithm::ChaCha20Poly1305, &nonce, &ad, plaintext, &mut sealed)
        .unwrap();
    assert_eq!(
        hex::encode(&sealed[plaintext.len()..]),
        "1ae10b594f09e26a7e902ecbd0600691"
    );
    assert_eq!(hex::encode(&sealed[..4]), "d31a8d34");

    let mut opened = vec![0u8; plaintext.len()];
    core.aead_decrypt(key, Algorithm::ChaCha20Poly1305, &nonce, &ad, &sealed, &mut opened)
        .unwrap();
    assert_eq!(&opened[..], &plaintext[..]);

    sealed[0] ^= 1;
    assert!(matches!(
        core.aead_decrypt(key, Algorithm::ChaCha20Poly1305, &nonce, &ad, &sealed, &mut opened),
        Err(CryptoError::InvalidSignature { .. })
    ));
}

#[test]
fn test_wrong_algorithm_category_rejected() {
    let core = CryptoCore::new(CoreConfig::default()).unwrap();
    let key = import(&core, KeyType::Aes, Algorithm::Gcm, &[1u8; 16]);
    let mut out = [0u8; 64];
    assert!(matches!(
        core.cipher_encrypt(key, Algorithm::Gcm, b"data", &mut out),
        Err(CryptoError::InvalidArgument { .. })
    ));
    assert!(matches!(
        core.cipher_encrypt(key, Algorithm::Ctr, b"data", &mut out),
        Err(CryptoError::NotPermitted { .. })
    ));
}
