#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use qasa_psa::prelude::*;

#[derive(Arbitrary, Debug)]
struct MultipartInput {
    gcm: bool,
    key: [u8; 32],
    nonce: [u8; 12],
    ad: Vec<u8>,
    plaintext: Vec<u8>,
    chunk_size: u8,
    tamper: Option<(u16, u8)>,
}

fuzz_target!(|input: MultipartInput| {
    let core = CryptoCore::new(CoreConfig::default()).expect("default core");
    let (key_type, alg) = if input.gcm {
        (KeyType::Aes, Algorithm::Gcm)
    } else {
        (KeyType::ChaCha20, Algorithm::ChaCha20Poly1305)
    };
    let attrs = KeyAttributes::new()
        .with_type(key_type)
        .with_usage(KeyUsage::ENCRYPT | KeyUsage::DECRYPT)
        .with_algorithm(alg);
    let key = core.import_key(&attrs, &input.key).expect("32-byte key");
    let chunk = (input.chunk_size as usize).max(1);

    let mut enc = AeadOperation::new();
    enc.encrypt_setup(&core, key, alg).expect("encrypt setup");
    enc.set_nonce(&input.nonce).expect("nonce");
    for part in input.ad.chunks(chunk) {
        enc.update_ad(part).expect("ad");
    }
    for part in input.plaintext.chunks(chunk) {
        enc.update(part).expect("payload");
    }
    let mut ciphertext = vec![0u8; input.plaintext.len()];
    let mut tag = [0u8; 16];
    enc.finish(&mut ciphertext, &mut tag).expect("finish");

    let mut sealed = ciphertext.clone();
    sealed.extend_from_slice(&tag);
    let mut one_shot = vec![0u8; sealed.len()];
    core.aead_encrypt(key, alg, &input.nonce, &input.ad, &input.plaintext, &mut one_shot)
        .expect("one-shot encrypt");
    assert_eq!(one_shot, sealed);

    if let Some((index, flip)) = input.tamper.filter(|(_, flip)| *flip != 0) {
        let index = index as usize % sealed.len();
        sealed[index] ^= flip;
    }
    let mut opened = vec![0u8; input.plaintext.len()];
    match core.aead_decrypt(key, alg, &input.nonce, &input.ad, &sealed, &mut opened) {
        Ok(n) => assert_eq!(&opened[..n], &input.plaintext[..]),
        Err(e) => assert!(matches!(e, CryptoError::InvalidSignature { .. })),
    }
    assert_eq!(core.stats().locked_slots, 0);
});
