#![no_main]

use libfuzzer_sys::fuzz_target;
use qasa_psa::storage::{decode_key, encode_key, KEY_FORMAT_VERSION, KEY_MAGIC};

fuzz_target!(|data: &[u8]| {
    // Raw bytes, then the same bytes behind a valid header
    let _ = decode_key(1, data);

    let mut framed = KEY_MAGIC.to_vec();
    framed.extend_from_slice(&KEY_FORMAT_VERSION.to_le_bytes());
    framed.extend_from_slice(data);
    if let Ok((attributes, material)) = decode_key(1, &framed) {
        let encoded = encode_key(&attributes, &material).expect("re-encoding a decoded key");
        let (again, _) = decode_key(1, encoded.as_bytes()).expect("decoding a re-encoded key");
        assert_eq!(again, attributes);
    }
});
