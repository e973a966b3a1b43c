#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use qasa_psa::prelude::*;

#[derive(Arbitrary, Debug)]
struct KeyImportInput {
    key_type: u8,
    bits: u16,
    usage: u32,
    data: Vec<u8>,
}

fn key_type(selector: u8) -> KeyType {
    match selector % 10 {
        0 => KeyType::RawData,
        1 => KeyType::Hmac,
        2 => KeyType::Derive,
        3 => KeyType::Aes,
        4 => KeyType::ChaCha20,
        5 => KeyType::RsaKeyPair,
        6 => KeyType::RsaPublicKey,
        7 => KeyType::EccKeyPair(EccFamily::Montgomery),
        8 => KeyType::EccKeyPair(EccFamily::TwistedEdwards),
        _ => KeyType::EccPublicKey(EccFamily::TwistedEdwards),
    }
}

fuzz_target!(|input: KeyImportInput| {
    let core = CryptoCore::new(CoreConfig::default()).expect("default core");
    let attrs = KeyAttributes::new()
        .with_type(key_type(input.key_type))
        .with_bits(input.bits as usize)
        .with_usage(KeyUsage::from_bits_truncate(input.usage) | KeyUsage::EXPORT);

    if let Ok(key) = core.import_key(&attrs, &input.data) {
        let stored = core.get_key_attributes(key).expect("imported key is readable");
        assert_eq!(stored.key_type(), attrs.key_type());
        let mut out = vec![0u8; 8192];
        let _ = core.export_key(key, &mut out);
        let _ = core.export_public_key(key, &mut out);
        core.destroy_key(key).expect("destroying an unlocked key");
    }
    assert_eq!(core.stats().leak_message(), None);
});
