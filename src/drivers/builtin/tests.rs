use super::*;
use crate::attributes::KeyUsage;
use crate::drivers::DerivationStep;
use crate::rng::PseudoRandom;

fn raw(bytes: &[u8]) -> KeyMaterial {
    KeyMaterial::Raw(SecureBytes::new(bytes))
}

fn unhex(s: &str) -> Vec<u8> {
    hex::decode(s).unwrap()
}

#[test]
fn test_chacha20_self_test() {
    chacha20::self_test().unwrap();
}

#[test]
fn test_chacha20_chunking_matches_single_call() {
    let key = [0x42u8; 32];
    let nonce = [0x24u8; 12];
    let input: Vec<u8> = (0..=255u8).cycle().take(300).collect();
    let whole = chacha20::chacha20_process(&key, &nonce, 7, &input).unwrap();

    for chunk in [1usize, 3, 63, 64, 65, 100] {
        let mut ctx = chacha20::ChaCha20Context::new();
        ctx.set_key(&key).unwrap();
        ctx.start(&nonce, 7).unwrap();
        let mut out = vec![0u8; input.len()];
        let mut offset = 0;
        for piece in input.chunks(chunk) {
            ctx.update(piece, &mut out[offset..offset + piece.len()]).unwrap();
            offset += piece.len();
        }
        assert_eq!(out, whole, "chunk size {}", chunk);
    }
}

#[test]
fn test_chacha20_zero_length_update() {
    let mut ctx = chacha20::ChaCha20Context::new();
    ctx.set_key(&[0u8; 32]).unwrap();
    ctx.start(&[0u8; 12], 0).unwrap();
    ctx.update(&[], &mut []).unwrap();
    let mut out = [0u8; 4];
    ctx.update(&[0u8; 4], &mut out).unwrap();
    assert_eq!(out, [0x76, 0xb8, 0xe0, 0xad]);
}

#[test]
fn test_sha256_known_answer() {
    let digest = BuiltinDriver.hash_compute(HashAlgorithm::Sha256, b"abc").unwrap();
    assert_eq!(
        digest,
        unhex("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
    );
}

#[test]
fn test_hash_clone_is_independent() {
    let mut op = BuiltinDriver.hash_setup(HashAlgorithm::Sha3_256).unwrap();
    op.update(b"shared prefix ").unwrap();
    let mut copy = op.box_clone().unwrap();
    op.update(b"tail").unwrap();
    copy.update(b"tail").unwrap();
    assert_eq!(op.finish().unwrap(), copy.finish().unwrap());
}

#[test]
fn test_hmac_known_answer() {
    let attrs = KeyAttributes::new().with_type(KeyType::Hmac);
    let tag = BuiltinDriver
        .mac_compute(
            &attrs,
            &raw(b"Jefe"),
            Algorithm::Hmac(HashAlgorithm::Sha256),
            b"what do ya want for nothing?",
        )
        .unwrap();
    assert_eq!(
        tag,
        unhex("5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843")
    );
}

#[test]
fn test_aes_ecb_known_answer() {
    let attrs = KeyAttributes::new().with_type(KeyType::Aes);
    let key = unhex("000102030405060708090a0b0c0d0e0f");
    let out = BuiltinDriver
        .cipher_compute(
            &attrs,
            &raw(&key),
            Algorithm::EcbNoPadding,
            CipherDirection::Encrypt,
            &[],
            &unhex("00112233445566778899aabbccddeeff"),
        )
        .unwrap();
    assert_eq!(out, unhex("69c4e0d86a7b0430d8cdb78070b4c55a"));
}

#[test]
fn test_cbc_pkcs7_round_trip_in_chunks() {
    let key = [7u8; 16];
    let iv = [9u8; 16];
    let plaintext: Vec<u8> = (0..45u8).collect();

    let mut enc = BuiltinCipher::new(Algorithm::CbcPkcs7, CipherDirection::Encrypt, &key).unwrap();
    enc.set_iv(&iv).unwrap();
    let mut ciphertext = Vec::new();
    for piece in plaintext.chunks(7) {
        let mut out = vec![0u8; enc.update_output_size(piece.len())];
        let n = enc.update(piece, &mut out).unwrap();
        ciphertext.extend_from_slice(&out[..n]);
    }
    let mut tail = [0u8; 16];
    let n = Box::new(enc).finish(&mut tail).unwrap();
    ciphertext.extend_from_slice(&tail[..n]);
    assert_eq!(ciphertext.len(), 48);

    let mut dec = BuiltinCipher::new(Algorithm::CbcPkcs7, CipherDirection::Decrypt, &key).unwrap();
    dec.set_iv(&iv).unwrap();
    let mut recovered = Vec::new();
    for piece in ciphertext.chunks(5) {
        let mut out = vec![0u8; dec.update_output_size(piece.len())];
        let n = dec.update(piece, &mut out).unwrap();
        recovered.extend_from_slice(&out[..n]);
    }
    let n = Box::new(dec).finish(&mut tail).unwrap();
    recovered.extend_from_slice(&tail[..n]);
    assert_eq!(recovered, plaintext);
}

#[test]
fn test_cbc_pkcs7_rejects_bad_padding() {
    let key = [3u8; 16];
    let attrs = KeyAttributes::new().with_type(KeyType::Aes);
    // A block whose decryption ends in 0x00 under a zero IV
    let block = BuiltinDriver
        .cipher_compute(&attrs, &raw(&key), Algorithm::EcbNoPadding, CipherDirection::Encrypt, &[], &[0u8; 16])
        .unwrap();
    let err = BuiltinDriver
        .cipher_compute(&attrs, &raw(&key), Algorithm::CbcPkcs7, CipherDirection::Decrypt, &[0u8; 16], &block)
        .unwrap_err();
    assert!(matches!(err, CryptoError::InvalidPadding { .. }));
}

#[test]
fn test_cbc_no_padding_rejects_partial_block() {
    let attrs = KeyAttributes::new().with_type(KeyType::Aes);
    let err = BuiltinDriver
        .cipher_compute(&attrs, &raw(&[1u8; 16]), Algorithm::CbcNoPadding, CipherDirection::Encrypt, &[0u8; 16], &[0u8; 20])
        .unwrap_err();
    assert!(matches!(err, CryptoError::InvalidArgument { .. }));
}

#[test]
fn test_ctr_update_before_iv_is_bad_state() {
    let mut op = BuiltinCipher::new(Algorithm::Ctr, CipherDirection::Encrypt, &[0u8; 16]).unwrap();
    let mut out = [0u8; 4];
    let err = op.update(&[1, 2, 3, 4], &mut out).unwrap_err();
    assert!(matches!(err, CryptoError::BadState { .. }));
}

#[test]
fn test_gcm_round_trip_and_tamper() {
    let attrs = KeyAttributes::new().with_type(KeyType::Aes);
    let key = raw(&[0x11u8; 32]);
    let nonce = [0x22u8; 12];
    let sealed = BuiltinDriver
        .aead_encrypt(&attrs, &key, Algorithm::Gcm, &nonce, b"header", b"attack at dawn")
        .unwrap();
    assert_eq!(sealed.len(), 14 + 16);

    let opened = BuiltinDriver
        .aead_decrypt(&attrs, &key, Algorithm::Gcm, &nonce, b"header", &sealed)
        .unwrap();
    assert_eq!(opened.as_bytes(), b"attack at dawn");

    let mut tampered = sealed.clone();
    tampered[0] ^= 1;
    let err = BuiltinDriver
        .aead_decrypt(&attrs, &key, Algorithm::Gcm, &nonce, b"header", &tampered)
        .unwrap_err();
    assert!(matches!(err, CryptoError::InvalidSignature { .. }));
}

#[test]
fn test_chacha20_poly1305_multipart_matches_one_shot() {
    let attrs = KeyAttributes::new().with_type(KeyType::ChaCha20);
    let key = raw(&[0x5au8; 32]);
    let nonce = [1u8; 12];
    let one_shot = BuiltinDriver
        .aead_encrypt(&attrs, &key, Algorithm::ChaCha20Poly1305, &nonce, b"ad", b"some plaintext")
        .unwrap();

    let mut op = BuiltinDriver
        .aead_setup(&attrs, &key, Algorithm::ChaCha20Poly1305, CipherDirection::Encrypt)
        .unwrap();
    op.set_nonce(&nonce).unwrap();
    op.update_ad(b"a").unwrap();
    op.update_ad(b"d").unwrap();
    op.update(b"some ").unwrap();
    op.update(b"plaintext").unwrap();
    assert!(matches!(op.update_ad(b"late").unwrap_err(), CryptoError::BadState { .. }));
    let (mut ct, tag) = op.finish().unwrap();
    ct.extend_from_slice(&tag);
    assert_eq!(ct, one_shot);
}

#[test]
fn test_hkdf_rfc5869_case_1() {
    let mut op = BuiltinDriver
        .key_derivation_setup(Algorithm::Hkdf(HashAlgorithm::Sha256))
        .unwrap();
    op.input_bytes(DerivationStep::Salt, &unhex("000102030405060708090a0b0c")).unwrap();
    op.input_bytes(DerivationStep::Secret, &[0x0b; 22]).unwrap();
    assert!(!op.ready());
    op.input_bytes(DerivationStep::Info, &unhex("f0f1f2f3f4f5f6f7f8f9")).unwrap();
    assert!(op.ready());
    assert_eq!(op.max_capacity(), 255 * 32);

    // Read in uneven pieces
    let mut okm = vec![0u8; 42];
    op.output(&mut okm[..5]).unwrap();
    op.output(&mut okm[5..40]).unwrap();
    op.output(&mut okm[40..]).unwrap();
    assert_eq!(
        okm,
        unhex("3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf34007208d5b887185865")
    );
    assert!(matches!(
        op.input_bytes(DerivationStep::Info, b"x").unwrap_err(),
        CryptoError::BadState { .. }
    ));
}

#[test]
fn test_hkdf_extract_yields_prk() {
    let mut op = BuiltinKdf::new(Algorithm::HkdfExtract(HashAlgorithm::Sha256)).unwrap();
    op.input_bytes(DerivationStep::Salt, &unhex("000102030405060708090a0b0c")).unwrap();
    op.input_bytes(DerivationStep::Secret, &[0x0b; 22]).unwrap();
    let mut prk = [0u8; 32];
    op.output(&mut prk).unwrap();
    assert_eq!(
        prk.to_vec(),
        unhex("077709362c2e32df0ddc3f0dc47bba6390b6c73bb50f9c3122ec844ad7c2b3e5")
    );
    assert!(matches!(
        op.output(&mut [0u8; 1]).unwrap_err(),
        CryptoError::InsufficientData { .. }
    ));
}

#[test]
fn test_hkdf_salt_after_secret_is_bad_state() {
    let mut op = BuiltinKdf::new(Algorithm::Hkdf(HashAlgorithm::Sha256)).unwrap();
    op.input_bytes(DerivationStep::Secret, b"secret").unwrap();
    let err = op.input_bytes(DerivationStep::Salt, b"salt").unwrap_err();
    assert!(matches!(err, CryptoError::BadState { .. }));
    let err = op.input_bytes(DerivationStep::Seed, b"seed").unwrap_err();
    assert!(matches!(err, CryptoError::InvalidArgument { .. }));
}

#[test]
fn test_tls12_prf_sha256() {
    let mut op = BuiltinKdf::new(Algorithm::Tls12Prf(HashAlgorithm::Sha256)).unwrap();
    op.input_bytes(DerivationStep::Seed, &unhex("a0ba9f936cda311827a6f796ffd5198c")).unwrap();
    op.input_bytes(DerivationStep::Secret, &unhex("9bbe436ba940f017b17652849a71db35")).unwrap();
    op.input_bytes(DerivationStep::Label, b"test label").unwrap();
    let mut out = vec![0u8; 100];
    op.output(&mut out).unwrap();
    assert_eq!(
        out,
        unhex(
            "e3f229ba727be17b8d122620557cd453c2aab21d07c3d495329b52d4e61edb5a\
             6b301791e90d35c9c9a46b4e14baf9af0fa022f7077def17abfd3797c0564bab\
             4fbc91666e9def9b97fce34f796789baa48082d122ee42c5a72e5a5110fff701\
             87347b66"
        )
    );
}

#[test]
fn test_pbkdf2_hmac_sha256() {
    for (cost, expected) in [
        (1u64, "120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b"),
        (2u64, "ae4d0c95af6b46d32d0adff928f06dd02a303f8ef3c251dfd6e2d85a95474c43"),
    ] {
        let mut op = BuiltinKdf::new(Algorithm::Pbkdf2Hmac(HashAlgorithm::Sha256)).unwrap();
        op.input_integer(DerivationStep::Cost, cost).unwrap();
        op.input_bytes(DerivationStep::Salt, b"sa").unwrap();
        op.input_bytes(DerivationStep::Salt, b"lt").unwrap();
        op.input_bytes(DerivationStep::Password, b"password").unwrap();
        let mut out = [0u8; 32];
        op.output(&mut out).unwrap();
        assert_eq!(out.to_vec(), unhex(expected));
    }
}

#[test]
fn test_pbkdf2_rejects_zero_cost() {
    let mut op = BuiltinKdf::new(Algorithm::Pbkdf2Hmac(HashAlgorithm::Sha256)).unwrap();
    assert!(matches!(
        op.input_integer(DerivationStep::Cost, 0).unwrap_err(),
        CryptoError::InvalidArgument { .. }
    ));
}

#[test]
fn test_ed25519_rfc8032_vector() {
    let attrs = KeyAttributes::new()
        .with_type(KeyType::EccKeyPair(EccFamily::TwistedEdwards))
        .with_usage(KeyUsage::SIGN_MESSAGE);
    let seed = unhex("9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60");
    let (material, bits) = BuiltinDriver.import_key(&attrs, &seed).unwrap();
    assert_eq!(bits, 255);

    let public = BuiltinDriver.export_public_key(&attrs, &material).unwrap();
    assert_eq!(
        public,
        unhex("d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a")
    );

    let mut rng = PseudoRandom::seed_from_u64(1);
    let sig = BuiltinDriver
        .sign_message(&attrs, &material, Algorithm::PureEddsa, b"", &mut rng)
        .unwrap();
    assert_eq!(
        sig,
        unhex(
            "e5564300c360ac729086e2cc806e828a84877f1eb8e5d974d873e065224901555fb8821590a33bacc61e39701cf9b46bd25bf5f0595bbe24655141438e7a100b"
        )
    );

    let public_attrs = KeyAttributes::new().with_type(KeyType::EccPublicKey(EccFamily::TwistedEdwards));
    let public_material = raw(&public);
    BuiltinDriver
        .verify_message(&public_attrs, &public_material, Algorithm::PureEddsa, b"", &sig)
        .unwrap();
    let err = BuiltinDriver
        .verify_message(&public_attrs, &public_material, Algorithm::PureEddsa, b"x", &sig)
        .unwrap_err();
    assert!(matches!(err, CryptoError::InvalidSignature { .. }));
}

#[test]
fn test_x25519_rfc7748_agreement() {
    let attrs = KeyAttributes::new().with_type(KeyType::EccKeyPair(EccFamily::Montgomery));
    let alice = raw(&unhex("77076d0a7318a57d3c16c17251b26645df4c2f87ebc0992ab177fba51db92c2a"));
    let bob_public = unhex("de9edb7d7b7dc1b4d35b61c2ece435373f8343c85b78674dadfc7e146f882b4f");

    assert_eq!(
        BuiltinDriver.export_public_key(&attrs, &alice).unwrap(),
        unhex("8520f0098930a754748b7ddcb43ef75b0dbf3a0d26381af4eba4a98eaa9b4e6a")
    );
    let shared = BuiltinDriver
        .key_agreement(&attrs, &alice, Algorithm::Ecdh, &bob_public)
        .unwrap();
    assert_eq!(
        shared.as_bytes().to_vec(),
        unhex("4a5d9d5ba4ce2de1728e3bf480350f25e07e21c947d19e3376f09b3c1e161742")
    );

    let err = BuiltinDriver
        .key_agreement(&attrs, &alice, Algorithm::Ecdh, &[0u8; 32])
        .unwrap_err();
    assert!(matches!(err, CryptoError::InvalidArgument { .. }));
}

#[test]
fn test_rsa_generate_sign_encrypt() {
    let mut rng = PseudoRandom::seed_from_u64(2024);
    let attrs = KeyAttributes::new().with_type(KeyType::RsaKeyPair).with_bits(1024);
    let material = BuiltinDriver.generate_key(&attrs, &mut rng).unwrap();

    // Re-import validates the encoding and recovers the size
    let import_attrs = KeyAttributes::new().with_type(KeyType::RsaKeyPair);
    let (_, bits) = BuiltinDriver.import_key(&import_attrs, material.raw().unwrap()).unwrap();
    assert_eq!(bits, 1024);

    let public_attrs = KeyAttributes::new().with_type(KeyType::RsaPublicKey);
    let public = raw(&BuiltinDriver.export_public_key(&attrs, &material).unwrap());

    for alg in [
        Algorithm::RsaPkcs1v15Sign(HashAlgorithm::Sha256),
        Algorithm::RsaPss(HashAlgorithm::Sha256),
    ] {
        let sig = BuiltinDriver
            .sign_message(&attrs, &material, alg, b"message", &mut rng)
            .unwrap();
        assert_eq!(sig.len(), 128);
        BuiltinDriver
            .verify_message(&public_attrs, &public, alg, b"message", &sig)
            .unwrap();
        let err = BuiltinDriver
            .verify_message(&public_attrs, &public, alg, b"massage", &sig)
            .unwrap_err();
        assert!(matches!(err, CryptoError::InvalidSignature { .. }));
    }

    for (alg, salt) in [
        (Algorithm::RsaPkcs1v15Crypt, &b""[..]),
        (Algorithm::RsaOaep(HashAlgorithm::Sha256), &b"label"[..]),
    ] {
        let ct = BuiltinDriver
            .asymmetric_encrypt(&public_attrs, &public, alg, b"secret", salt, &mut rng)
            .unwrap();
        let pt = BuiltinDriver
            .asymmetric_decrypt(&attrs, &material, alg, &ct, salt, &mut rng)
            .unwrap();
        assert_eq!(pt.as_bytes(), b"secret");
    }

    // A public key cannot sign
    let err = BuiltinDriver
        .sign_hash(&public_attrs, &public, Algorithm::RsaPkcs1v15SignRaw, &[0u8; 32], &mut rng)
        .unwrap_err();
    assert!(matches!(err, CryptoError::InvalidArgument { .. }));
}

#[test]
fn test_import_validates_sizes() {
    let aes = KeyAttributes::new().with_type(KeyType::Aes);
    assert!(BuiltinDriver.import_key(&aes, &[0u8; 15]).is_err());
    let (_, bits) = BuiltinDriver.import_key(&aes, &[0u8; 24]).unwrap();
    assert_eq!(bits, 192);

    let mismatched = KeyAttributes::new().with_type(KeyType::Aes).with_bits(256);
    assert!(matches!(
        BuiltinDriver.import_key(&mismatched, &[0u8; 16]).unwrap_err(),
        CryptoError::InvalidArgument { .. }
    ));

    let raw_data = KeyAttributes::new().with_type(KeyType::RawData);
    assert!(BuiltinDriver.import_key(&raw_data, &[]).is_err());
}

#[test]
fn test_supports_everything_but_ecdsa() {
    assert!(BuiltinDriver.supports(Algorithm::Ctr));
    assert!(BuiltinDriver.supports(Algorithm::Hkdf(HashAlgorithm::Sha384)));
    assert!(!BuiltinDriver.supports(Algorithm::Ecdsa(HashAlgorithm::Sha256)));
    assert!(!BuiltinDriver.supports(Algorithm::Hmac(HashAlgorithm::Any)));
}
