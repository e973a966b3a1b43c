//! Import, generation and export of transparent key material

use super::asymmetric;
use crate::attributes::{KeyAttributes, KeyType};
use crate::error::{CryptoError, CryptoResult};
use crate::rng::RandomSource;
use crate::secure_memory::SecureBytes;

/// Largest unstructured key accepted, in bytes
pub const MAX_RAW_KEY_SIZE: usize = 1024;

fn symmetric_bits(key_type: KeyType, len: usize) -> CryptoResult<usize> {
    let valid = match key_type {
        KeyType::Aes => matches!(len, 16 | 24 | 32),
        KeyType::ChaCha20 => len == 32,
        KeyType::RawData | KeyType::Hmac | KeyType::Derive | KeyType::Password => {
            (1..=MAX_RAW_KEY_SIZE).contains(&len)
        }
        _ => false,
    };
    if valid {
        Ok(len * 8)
    } else {
        Err(CryptoError::invalid_argument(
            "key data",
            &format!("a valid {:?} key length", key_type),
            &format!("{} bytes", len),
        ))
    }
}

/// Validate imported data against the attributes
///
/// Returns the material in its canonical form and the key size in bits.
/// A non-zero `bits` in the attributes must match the data.
pub fn import(attributes: &KeyAttributes, data: &[u8]) -> CryptoResult<(SecureBytes, usize)> {
    let key_type = attributes.key_type();
    let bits = match key_type {
        KeyType::None => {
            return Err(CryptoError::invalid_argument("key type", "a concrete key type", "none"))
        }
        KeyType::RsaKeyPair | KeyType::RsaPublicKey => asymmetric::rsa_import(key_type, data)?,
        KeyType::EccKeyPair(_) | KeyType::EccPublicKey(_) => asymmetric::ecc_import(key_type, data)?,
        _ => symmetric_bits(key_type, data.len())?,
    };
    if attributes.bits() != 0 && attributes.bits() != bits {
        return Err(CryptoError::invalid_argument(
            "bits",
            &format!("{} (size of the key data)", bits),
            &attributes.bits().to_string(),
        ));
    }
    Ok((SecureBytes::new(data), bits))
}

/// Generate fresh material for the type and size in the attributes
pub fn generate(attributes: &KeyAttributes, rng: &mut dyn RandomSource) -> CryptoResult<SecureBytes> {
    let key_type = attributes.key_type();
    let bits = attributes.bits();
    if bits == 0 {
        return Err(CryptoError::invalid_argument("bits", "a non-zero key size", "0"));
    }
    match key_type {
        KeyType::RsaKeyPair => asymmetric::rsa_generate(bits, attributes.domain_parameter_bytes(), rng),
        KeyType::EccKeyPair(_) => asymmetric::ecc_generate(key_type, bits, rng),
        KeyType::None | KeyType::RsaPublicKey | KeyType::EccPublicKey(_) => Err(CryptoError::invalid_argument(
            "key type",
            "a symmetric type or key pair",
            &format!("{:?}", key_type),
        )),
        _ => {
            if bits % 8 != 0 {
                return Err(CryptoError::invalid_argument(
                    "bits",
                    "a whole number of bytes",
                    &bits.to_string(),
                ));
            }
            symmetric_bits(key_type, bits / 8)?;
            let mut key = SecureBytes::zeroed(bits / 8);
            rng.get_random(key.as_bytes_mut())?;
            Ok(key)
        }
    }
}

/// Public part of an asymmetric key in its export format
pub fn export_public(attributes: &KeyAttributes, data: &[u8]) -> CryptoResult<Vec<u8>> {
    match attributes.key_type() {
        key_type @ (KeyType::RsaKeyPair | KeyType::RsaPublicKey) => asymmetric::rsa_public_der(key_type, data),
        key_type @ (KeyType::EccKeyPair(_) | KeyType::EccPublicKey(_)) => asymmetric::ecc_public(key_type, data),
        other => Err(CryptoError::invalid_argument(
            "key type",
            "an asymmetric key",
            &format!("{:?}", other),
        )),
    }
}
