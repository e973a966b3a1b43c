/*!
 * Built-in Software Driver
 *
 * The transparent driver for local-storage keys. Material is held in the
 * export format of each key type and handed in as raw bytes for every
 * call.
 */

use crate::algorithm::{Algorithm, HashAlgorithm};
use crate::attributes::{EccFamily, KeyAttributes, KeyType, Location};
use crate::drivers::{AeadOp, CipherDirection, CipherOp, CryptoDriver, DriverKind, HashOp, KdfOp, MacOp};
use crate::error::{CryptoError, CryptoResult};
use crate::rng::RandomSource;
use crate::secure_memory::SecureBytes;
use crate::slots::KeyMaterial;

pub mod aead;
pub mod asymmetric;
pub mod chacha20;
pub mod cipher;
pub mod hash;
pub mod kdf;
pub mod key_management;
pub mod mac;

pub use aead::BuiltinAead;
pub use cipher::BuiltinCipher;
pub use hash::BuiltinHash;
pub use kdf::BuiltinKdf;
pub use mac::BuiltinHmac;

/// Software implementation of every supported algorithm
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinDriver;

impl BuiltinDriver {
    pub fn new() -> Self {
        Self
    }
}

fn require_key_pair(attributes: &KeyAttributes, operation: &str) -> CryptoResult<()> {
    if attributes.key_type().is_key_pair() {
        Ok(())
    } else {
        Err(CryptoError::invalid_argument(
            "key",
            &format!("a key pair for {}", operation),
            &format!("{:?}", attributes.key_type()),
        ))
    }
}

fn is_rsa_signature(alg: Algorithm) -> bool {
    matches!(
        alg,
        Algorithm::RsaPkcs1v15Sign(_) | Algorithm::RsaPkcs1v15SignRaw | Algorithm::RsaPss(_)
    )
}

impl CryptoDriver for BuiltinDriver {
    fn name(&self) -> &'static str {
        "builtin"
    }

    fn kind(&self) -> DriverKind {
        DriverKind::Transparent
    }

    fn location(&self) -> Location {
        Location::LOCAL_STORAGE
    }

    fn supports(&self, alg: Algorithm) -> bool {
        !alg.is_wildcard() && !matches!(alg, Algorithm::Ecdsa(_))
    }

    fn import_key(&self, attributes: &KeyAttributes, data: &[u8]) -> CryptoResult<(KeyMaterial, usize)> {
        let (bytes, bits) = key_management::import(attributes, data)?;
        Ok((KeyMaterial::Raw(bytes), bits))
    }

    fn generate_key(&self, attributes: &KeyAttributes, rng: &mut dyn RandomSource) -> CryptoResult<KeyMaterial> {
        key_management::generate(attributes, rng).map(KeyMaterial::Raw)
    }

    fn export_key(&self, _attributes: &KeyAttributes, material: &KeyMaterial) -> CryptoResult<SecureBytes> {
        Ok(SecureBytes::new(material.raw()?))
    }

    fn export_public_key(&self, attributes: &KeyAttributes, material: &KeyMaterial) -> CryptoResult<Vec<u8>> {
        key_management::export_public(attributes, material.raw()?)
    }

    fn copy_key(&self, _attributes: &KeyAttributes, material: &KeyMaterial) -> CryptoResult<KeyMaterial> {
        Ok(KeyMaterial::Raw(SecureBytes::new(material.raw()?)))
    }

    fn hash_setup(&self, alg: HashAlgorithm) -> CryptoResult<Box<dyn HashOp>> {
        Ok(Box::new(BuiltinHash::new(alg)?))
    }

    fn mac_setup(
        &self,
        _attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
    ) -> CryptoResult<Box<dyn MacOp>> {
        match alg {
            Algorithm::Hmac(hash) => Ok(Box::new(BuiltinHmac::new(hash, material.raw()?)?)),
            other => Err(CryptoError::not_supported(format!("{} as a MAC", other))),
        }
    }

    fn cipher_setup(
        &self,
        _attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
        direction: CipherDirection,
    ) -> CryptoResult<Box<dyn CipherOp>> {
        Ok(Box::new(BuiltinCipher::new(alg, direction, material.raw()?)?))
    }

    fn aead_setup(
        &self,
        _attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
        direction: CipherDirection,
    ) -> CryptoResult<Box<dyn AeadOp>> {
        Ok(Box::new(BuiltinAead::new(alg, direction, material.raw()?)?))
    }

    fn sign_hash(
        &self,
        attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
        hash: &[u8],
        rng: &mut dyn RandomSource,
    ) -> CryptoResult<Vec<u8>> {
        if !is_rsa_signature(alg) {
            return Err(CryptoError::not_supported(format!("{} over a hash", alg)));
        }
        require_key_pair(attributes, "signing")?;
        asymmetric::rsa_sign(alg, material.raw()?, hash, rng)
    }

    fn verify_hash(
        &self,
        attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
        hash: &[u8],
        signature: &[u8],
    ) -> CryptoResult<()> {
        if !is_rsa_signature(alg) {
            return Err(CryptoError::not_supported(format!("{} over a hash", alg)));
        }
        asymmetric::rsa_verify(alg, attributes.key_type(), material.raw()?, hash, signature)
    }

    fn sign_message(
        &self,
        attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
        message: &[u8],
        rng: &mut dyn RandomSource,
    ) -> CryptoResult<Vec<u8>> {
        match alg {
            Algorithm::PureEddsa => {
                require_key_pair(attributes, "signing")?;
                asymmetric::ed25519_sign(material.raw()?, message)
            }
            Algorithm::RsaPkcs1v15Sign(h) | Algorithm::RsaPss(h) => {
                let digest = hash::compute(h, message)?;
                self.sign_hash(attributes, material, alg, &digest, rng)
            }
            other => Err(CryptoError::not_supported(format!("{} on messages", other))),
        }
    }

    fn verify_message(
        &self,
        attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
        message: &[u8],
        signature: &[u8],
    ) -> CryptoResult<()> {
        match alg {
            Algorithm::PureEddsa => {
                asymmetric::ed25519_verify(attributes.key_type(), material.raw()?, message, signature)
            }
            Algorithm::RsaPkcs1v15Sign(h) | Algorithm::RsaPss(h) => {
                let digest = hash::compute(h, message)?;
                self.verify_hash(attributes, material, alg, &digest, signature)
            }
            other => Err(CryptoError::not_supported(format!("{} on messages", other))),
        }
    }

    fn asymmetric_encrypt(
        &self,
        attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
        input: &[u8],
        salt: &[u8],
        rng: &mut dyn RandomSource,
    ) -> CryptoResult<Vec<u8>> {
        asymmetric::rsa_encrypt(alg, attributes.key_type(), material.raw()?, input, salt, rng)
    }

    fn asymmetric_decrypt(
        &self,
        attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
        input: &[u8],
        salt: &[u8],
        rng: &mut dyn RandomSource,
    ) -> CryptoResult<SecureBytes> {
        require_key_pair(attributes, "decryption")?;
        asymmetric::rsa_decrypt(alg, material.raw()?, input, salt, rng)
    }

    fn key_agreement(
        &self,
        attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
        peer_key: &[u8],
    ) -> CryptoResult<SecureBytes> {
        match (alg, attributes.key_type()) {
            (Algorithm::Ecdh, KeyType::EccKeyPair(EccFamily::Montgomery)) => {
                asymmetric::x25519_agree(material.raw()?, peer_key)
            }
            (Algorithm::Ecdh, other) => Err(CryptoError::not_supported(format!("ECDH with {:?} keys", other))),
            (other, _) => Err(CryptoError::not_supported(format!("{} as a key agreement", other))),
        }
    }

    fn key_derivation_setup(&self, alg: Algorithm) -> CryptoResult<Box<dyn KdfOp>> {
        Ok(Box::new(BuiltinKdf::new(alg)?))
    }
}

#[cfg(test)]
mod tests;
