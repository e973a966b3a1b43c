//! Asymmetric primitives: RSA, Ed25519 and X25519
//!
//! Key material follows the export formats: PKCS#1 DER for RSA key pairs
//! and public keys, the 32-byte seed or scalar for Curve25519 key pairs,
//! and the 32-byte encoded point for Curve25519 public keys.

use ring::signature::{self, Ed25519KeyPair, KeyPair, UnparsedPublicKey};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Oaep, Pkcs1v15Encrypt, Pkcs1v15Sign, Pss, RsaPrivateKey, RsaPublicKey};

use super::hash::with_hash;
use crate::algorithm::Algorithm;
use crate::attributes::{EccFamily, KeyType};
use crate::error::{CryptoError, CryptoResult};
use crate::rng::{RandomSource, RngAdapter};
use crate::secure_memory::SecureBytes;

/// Curve25519 scalar, seed and point size
pub const CURVE25519_KEY_SIZE: usize = 32;

/// Public exponent used when no domain parameters are given
pub const RSA_DEFAULT_EXPONENT: u32 = 65537;

const RSA_MIN_BITS: usize = 1024;
const RSA_MAX_BITS: usize = 4096;

fn rsa_error(operation: &str, err: rsa::Error) -> CryptoError {
    match err {
        rsa::Error::Verification => CryptoError::InvalidSignature {
            operation: operation.to_string(),
        },
        rsa::Error::Decryption => CryptoError::InvalidPadding {
            operation: operation.to_string(),
        },
        rsa::Error::MessageTooLong | rsa::Error::InputNotHashed => {
            CryptoError::invalid_argument("input", "a valid input length", &err.to_string())
        }
        other => CryptoError::generic(operation, other),
    }
}

fn malformed(what: &str, err: impl ToString) -> CryptoError {
    CryptoError::invalid_argument("key data", what, &err.to_string())
}

fn rsa_private(der: &[u8]) -> CryptoResult<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs1_der(der).map_err(|e| malformed("a PKCS#1 RSAPrivateKey", e))
}

fn rsa_public(key_type: KeyType, der: &[u8]) -> CryptoResult<RsaPublicKey> {
    match key_type {
        KeyType::RsaKeyPair => Ok(rsa_private(der)?.to_public_key()),
        KeyType::RsaPublicKey => {
            RsaPublicKey::from_pkcs1_der(der).map_err(|e| malformed("a PKCS#1 RSAPublicKey", e))
        }
        other => Err(CryptoError::invalid_argument(
            "key type",
            "an RSA key",
            &format!("{:?}", other),
        )),
    }
}

/// Validate RSA key data and return its modulus size in bits
pub fn rsa_import(key_type: KeyType, der: &[u8]) -> CryptoResult<usize> {
    let bits = match key_type {
        KeyType::RsaKeyPair => {
            let key = rsa_private(der)?;
            key.validate().map_err(|e| malformed("a consistent RSA key pair", e))?;
            key.n().bits()
        }
        _ => rsa_public(key_type, der)?.n().bits(),
    };
    if !(RSA_MIN_BITS..=RSA_MAX_BITS).contains(&bits) {
        return Err(CryptoError::not_supported(format!("{}-bit RSA keys", bits)));
    }
    Ok(bits)
}

/// Generate an RSA key pair, encoded as PKCS#1 DER
///
/// `exponent` is the big-endian public exponent; empty selects 65537.
pub fn rsa_generate(bits: usize, exponent: &[u8], rng: &mut dyn RandomSource) -> CryptoResult<SecureBytes> {
    if !(RSA_MIN_BITS..=RSA_MAX_BITS).contains(&bits) || bits % 8 != 0 {
        return Err(CryptoError::not_supported(format!("{}-bit RSA keys", bits)));
    }
    let exp = if exponent.is_empty() {
        BigUint::from(RSA_DEFAULT_EXPONENT)
    } else {
        BigUint::from_bytes_be(exponent)
    };
    let mut adapter = RngAdapter::new(rng);
    let generated = RsaPrivateKey::new_with_exp(&mut adapter, bits, &exp);
    adapter.finish()?;
    let key = generated.map_err(|e| rsa_error("rsa key generation", e))?;
    let der = key
        .to_pkcs1_der()
        .map_err(|e| CryptoError::generic("rsa key encoding", e))?;
    Ok(SecureBytes::new(der.as_bytes()))
}

/// PKCS#1 RSAPublicKey of an RSA key pair or public key
pub fn rsa_public_der(key_type: KeyType, der: &[u8]) -> CryptoResult<Vec<u8>> {
    let public = rsa_public(key_type, der)?;
    let doc = public
        .to_pkcs1_der()
        .map_err(|e| CryptoError::generic("rsa public key encoding", e))?;
    Ok(doc.as_bytes().to_vec())
}

fn pkcs1v15_scheme(alg: Algorithm) -> CryptoResult<Pkcs1v15Sign> {
    match alg {
        Algorithm::RsaPkcs1v15SignRaw => Ok(Pkcs1v15Sign::new_unprefixed()),
        Algorithm::RsaPkcs1v15Sign(hash) => with_hash!(hash, |D| Ok(Pkcs1v15Sign::new::<D>())),
        other => Err(CryptoError::not_supported(format!("{} as PKCS#1 v1.5", other))),
    }
}

pub fn rsa_sign(alg: Algorithm, der: &[u8], hash: &[u8], rng: &mut dyn RandomSource) -> CryptoResult<Vec<u8>> {
    let key = rsa_private(der)?;
    let mut adapter = RngAdapter::new(rng);
    let signed = match alg {
        Algorithm::RsaPss(h) => {
            with_hash!(h, |D| Ok(key.sign_with_rng(&mut adapter, Pss::new::<D>(), hash)))?
        }
        _ => {
            let scheme = pkcs1v15_scheme(alg)?;
            key.sign_with_rng(&mut adapter, scheme, hash)
        }
    };
    adapter.finish()?;
    signed.map_err(|e| rsa_error("rsa sign", e))
}

pub fn rsa_verify(alg: Algorithm, key_type: KeyType, der: &[u8], hash: &[u8], sig: &[u8]) -> CryptoResult<()> {
    let key = rsa_public(key_type, der)?;
    if sig.len() != key.size() {
        return Err(CryptoError::InvalidSignature {
            operation: format!("{} signature of {} bytes", alg, sig.len()),
        });
    }
    let verified = match alg {
        Algorithm::RsaPss(h) => with_hash!(h, |D| Ok(key.verify(Pss::new::<D>(), hash, sig)))?,
        _ => key.verify(pkcs1v15_scheme(alg)?, hash, sig),
    };
    verified.map_err(|e| rsa_error("rsa verify", e))
}

fn oaep_label(salt: &[u8]) -> CryptoResult<Option<String>> {
    if salt.is_empty() {
        return Ok(None);
    }
    String::from_utf8(salt.to_vec())
        .map(Some)
        .map_err(|_| CryptoError::not_supported("non-UTF-8 OAEP labels"))
}

fn oaep_scheme(hash: crate::algorithm::HashAlgorithm, salt: &[u8]) -> CryptoResult<Oaep> {
    let label = oaep_label(salt)?;
    with_hash!(hash, |D| Ok(match label {
        Some(label) => Oaep::new_with_label::<D, _>(label),
        None => Oaep::new::<D>(),
    }))
}

fn reject_salt(alg: Algorithm, salt: &[u8]) -> CryptoResult<()> {
    if salt.is_empty() {
        Ok(())
    } else {
        Err(CryptoError::invalid_argument(
            "salt",
            &format!("no salt for {}", alg),
            &format!("{} bytes", salt.len()),
        ))
    }
}

pub fn rsa_encrypt(
    alg: Algorithm,
    key_type: KeyType,
    der: &[u8],
    input: &[u8],
    salt: &[u8],
    rng: &mut dyn RandomSource,
) -> CryptoResult<Vec<u8>> {
    let key = rsa_public(key_type, der)?;
    let mut adapter = RngAdapter::new(rng);
    let encrypted = match alg {
        Algorithm::RsaPkcs1v15Crypt => {
            reject_salt(alg, salt)?;
            key.encrypt(&mut adapter, Pkcs1v15Encrypt, input)
        }
        Algorithm::RsaOaep(h) => key.encrypt(&mut adapter, oaep_scheme(h, salt)?, input),
        other => return Err(CryptoError::not_supported(format!("{} encryption", other))),
    };
    adapter.finish()?;
    encrypted.map_err(|e| rsa_error("rsa encrypt", e))
}

pub fn rsa_decrypt(
    alg: Algorithm,
    der: &[u8],
    input: &[u8],
    salt: &[u8],
    rng: &mut dyn RandomSource,
) -> CryptoResult<SecureBytes> {
    let key = rsa_private(der)?;
    if input.len() != key.size() {
        return Err(CryptoError::invalid_argument(
            "ciphertext",
            &format!("{} bytes", key.size()),
            &format!("{} bytes", input.len()),
        ));
    }
    let mut adapter = RngAdapter::new(rng);
    let decrypted = match alg {
        Algorithm::RsaPkcs1v15Crypt => {
            reject_salt(alg, salt)?;
            key.decrypt_blinded(&mut adapter, Pkcs1v15Encrypt, input)
        }
        Algorithm::RsaOaep(h) => key.decrypt_blinded(&mut adapter, oaep_scheme(h, salt)?, input),
        other => return Err(CryptoError::not_supported(format!("{} decryption", other))),
    };
    adapter.finish()?;
    decrypted
        .map(SecureBytes::from)
        .map_err(|e| rsa_error("rsa decrypt", e))
}

fn curve25519_bytes(data: &[u8]) -> CryptoResult<[u8; CURVE25519_KEY_SIZE]> {
    data.try_into().map_err(|_| {
        CryptoError::invalid_argument(
            "key data",
            "32 bytes",
            &format!("{} bytes", data.len()),
        )
    })
}

/// Validate Curve25519 key data and return its size in bits
pub fn ecc_import(key_type: KeyType, data: &[u8]) -> CryptoResult<usize> {
    match key_type {
        KeyType::EccKeyPair(EccFamily::TwistedEdwards) => {
            Ed25519KeyPair::from_seed_unchecked(data).map_err(|e| malformed("an Ed25519 seed", e))?;
            Ok(255)
        }
        KeyType::EccKeyPair(EccFamily::Montgomery)
        | KeyType::EccPublicKey(EccFamily::Montgomery)
        | KeyType::EccPublicKey(EccFamily::TwistedEdwards) => {
            curve25519_bytes(data)?;
            Ok(255)
        }
        other => Err(CryptoError::not_supported(format!("{:?} keys", other))),
    }
}

/// Generate a Curve25519 seed or scalar
pub fn ecc_generate(key_type: KeyType, bits: usize, rng: &mut dyn RandomSource) -> CryptoResult<SecureBytes> {
    match key_type {
        KeyType::EccKeyPair(EccFamily::TwistedEdwards | EccFamily::Montgomery) if bits == 255 => {
            let mut key = SecureBytes::zeroed(CURVE25519_KEY_SIZE);
            rng.get_random(key.as_bytes_mut())?;
            Ok(key)
        }
        other => Err(CryptoError::not_supported(format!(
            "generating {}-bit {:?} keys",
            bits, other
        ))),
    }
}

/// Public point of a Curve25519 key pair (identity for public keys)
pub fn ecc_public(key_type: KeyType, data: &[u8]) -> CryptoResult<Vec<u8>> {
    match key_type {
        KeyType::EccKeyPair(EccFamily::TwistedEdwards) => {
            let pair = Ed25519KeyPair::from_seed_unchecked(data).map_err(|e| malformed("an Ed25519 seed", e))?;
            Ok(pair.public_key().as_ref().to_vec())
        }
        KeyType::EccKeyPair(EccFamily::Montgomery) => {
            let scalar = curve25519_bytes(data)?;
            Ok(x25519_dalek::x25519(scalar, x25519_dalek::X25519_BASEPOINT_BYTES).to_vec())
        }
        KeyType::EccPublicKey(EccFamily::TwistedEdwards | EccFamily::Montgomery) => Ok(data.to_vec()),
        other => Err(CryptoError::not_supported(format!("{:?} keys", other))),
    }
}

/// Ed25519 signature over `message` (PureEdDSA)
pub fn ed25519_sign(seed: &[u8], message: &[u8]) -> CryptoResult<Vec<u8>> {
    let pair = Ed25519KeyPair::from_seed_unchecked(seed).map_err(|e| malformed("an Ed25519 seed", e))?;
    Ok(pair.sign(message).as_ref().to_vec())
}

pub fn ed25519_verify(key_type: KeyType, data: &[u8], message: &[u8], sig: &[u8]) -> CryptoResult<()> {
    let public = ecc_public(key_type, data)?;
    UnparsedPublicKey::new(&signature::ED25519, &public)
        .verify(message, sig)
        .map_err(|_| CryptoError::InvalidSignature {
            operation: "ed25519 verify".to_string(),
        })
}

/// X25519 shared secret
///
/// An all-zero result means the peer sent a low-order point and is
/// rejected.
pub fn x25519_agree(scalar: &[u8], peer: &[u8]) -> CryptoResult<SecureBytes> {
    let scalar = curve25519_bytes(scalar)?;
    let peer: [u8; CURVE25519_KEY_SIZE] = peer.try_into().map_err(|_| {
        CryptoError::invalid_argument("peer key", "32 bytes", &format!("{} bytes", peer.len()))
    })?;
    let shared = SecureBytes::new(&x25519_dalek::x25519(scalar, peer));
    if shared.as_bytes().iter().all(|b| *b == 0) {
        return Err(CryptoError::invalid_argument(
            "peer key",
            "a point of large order",
            "a low-order point",
        ));
    }
    Ok(shared)
}
