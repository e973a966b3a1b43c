//! Opaque test driver
//!
//! Key material lives in a token table inside the driver; the core only
//! ever sees `(location, token)` handles. Tokens below
//! [`OPAQUE_TOKEN_BASE`] designate the builtin keys of the test platform.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::transparent::{HookedAead, HookedCipher, HookedMac};
use super::{HookCategory, TestDriverHooks};
use crate::algorithm::{Algorithm, AlgorithmCategory};
use crate::attributes::{EccFamily, KeyAttributes, KeyType, KeyUsage, Lifetime, Location, Persistence};
use crate::drivers::{AeadOp, BuiltinDriver, CipherDirection, CipherOp, CryptoDriver, DriverKind, MacOp};
use crate::error::{CryptoError, CryptoResult};
use crate::rng::RandomSource;
use crate::secure_memory::SecureBytes;
use crate::slots::{KeyMaterial, OpaqueHandle, TEST_DRIVER_AES_KEY_SLOT, TEST_DRIVER_ED25519_KEY_SLOT};

/// First token handed out for imported or generated keys
pub const OPAQUE_TOKEN_BASE: u64 = 0x1000;

/// Ed25519 seed of builtin slot 1 (RFC 8032 test 1)
const BUILTIN_ED25519_SEED: [u8; 32] = [
    0x9d, 0x61, 0xb1, 0x9d, 0xef, 0xfd, 0x5a, 0x60, 0xba, 0x84, 0x4a, 0xf4, 0x92, 0xec, 0x2c, 0xc4,
    0x44, 0x49, 0xc5, 0x69, 0x7b, 0x32, 0x69, 0x19, 0x70, 0x3b, 0xac, 0x03, 0x1c, 0xae, 0x7f, 0x60,
];

fn builtin_aes_key() -> [u8; 16] {
    let mut key = [0u8; 16];
    for (i, byte) in key.iter_mut().enumerate() {
        *byte = 0x40 + i as u8;
    }
    key
}

/// Driver owning keys at [`Location::TEST_DRIVER`]
pub struct OpaqueTestDriver {
    inner: BuiltinDriver,
    keys: Mutex<HashMap<u64, SecureBytes>>,
    next_token: AtomicU64,
    hooks: Arc<TestDriverHooks>,
}

impl OpaqueTestDriver {
    pub fn new(hooks: Arc<TestDriverHooks>) -> Self {
        Self {
            inner: BuiltinDriver::new(),
            keys: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(OPAQUE_TOKEN_BASE),
            hooks,
        }
    }

    /// Number of keys held in the token table
    pub fn key_count(&self) -> usize {
        self.keys.lock().map(|keys| keys.len()).unwrap_or(0)
    }

    fn store(&self, bytes: SecureBytes) -> CryptoResult<KeyMaterial> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.keys.lock()?.insert(token, bytes);
        Ok(KeyMaterial::Opaque(OpaqueHandle {
            location: Location::TEST_DRIVER,
            slot_number: token,
        }))
    }

    /// Resolve a handle into transparent material for the software code
    fn unwrap_key(&self, material: &KeyMaterial) -> CryptoResult<KeyMaterial> {
        let handle = material.opaque()?;
        if handle.location != Location::TEST_DRIVER {
            return Err(CryptoError::invalid_argument(
                "key location",
                "the test driver location",
                &format!("{:#x}", handle.location.0),
            ));
        }
        let bytes = match handle.slot_number {
            TEST_DRIVER_AES_KEY_SLOT => SecureBytes::new(&builtin_aes_key()),
            TEST_DRIVER_ED25519_KEY_SLOT => SecureBytes::new(&BUILTIN_ED25519_SEED),
            token => self.keys.lock()?.get(&token).cloned().ok_or_else(|| {
                CryptoError::invalid_argument("opaque handle", "a live token", &format!("{:#x}", token))
            })?,
        };
        Ok(KeyMaterial::Raw(bytes))
    }
}

impl CryptoDriver for OpaqueTestDriver {
    fn name(&self) -> &'static str {
        "test-opaque"
    }

    fn kind(&self) -> DriverKind {
        DriverKind::Opaque
    }

    fn location(&self) -> Location {
        Location::TEST_DRIVER
    }

    fn supports(&self, alg: Algorithm) -> bool {
        // Hashes and derivations take no key and always run locally
        !matches!(alg.category(), AlgorithmCategory::Hash | AlgorithmCategory::KeyDerivation)
            && self.inner.supports(alg)
    }

    fn import_key(&self, attributes: &KeyAttributes, data: &[u8]) -> CryptoResult<(KeyMaterial, usize)> {
        self.hooks.hit(HookCategory::KeyManagement)?;
        let (material, bits) = self.inner.import_key(attributes, data)?;
        let bytes = SecureBytes::new(material.raw()?);
        Ok((self.store(bytes)?, bits))
    }

    fn generate_key(&self, attributes: &KeyAttributes, rng: &mut dyn RandomSource) -> CryptoResult<KeyMaterial> {
        self.hooks.hit(HookCategory::KeyManagement)?;
        let material = self.inner.generate_key(attributes, rng)?;
        self.store(SecureBytes::new(material.raw()?))
    }

    fn export_key(&self, attributes: &KeyAttributes, material: &KeyMaterial) -> CryptoResult<SecureBytes> {
        self.hooks.hit(HookCategory::KeyManagement)?;
        self.inner.export_key(attributes, &self.unwrap_key(material)?)
    }

    fn export_public_key(&self, attributes: &KeyAttributes, material: &KeyMaterial) -> CryptoResult<Vec<u8>> {
        self.hooks.hit(HookCategory::KeyManagement)?;
        self.inner.export_public_key(attributes, &self.unwrap_key(material)?)
    }

    fn copy_key(&self, _attributes: &KeyAttributes, material: &KeyMaterial) -> CryptoResult<KeyMaterial> {
        self.hooks.hit(HookCategory::KeyManagement)?;
        let raw = self.unwrap_key(material)?;
        self.store(SecureBytes::new(raw.raw()?))
    }

    fn destroy_key(&self, material: &KeyMaterial) -> CryptoResult<()> {
        let handle = material.opaque()?;
        if handle.slot_number >= OPAQUE_TOKEN_BASE {
            self.keys.lock()?.remove(&handle.slot_number);
        }
        Ok(())
    }

    fn get_builtin_key(&self, slot_number: u64) -> CryptoResult<(KeyAttributes, KeyMaterial)> {
        self.hooks.hit(HookCategory::KeyManagement)?;
        let attributes = match slot_number {
            TEST_DRIVER_AES_KEY_SLOT => KeyAttributes::new()
                .with_type(KeyType::Aes)
                .with_bits(128)
                .with_usage(KeyUsage::ENCRYPT | KeyUsage::DECRYPT | KeyUsage::EXPORT)
                .with_algorithm(Algorithm::Ctr),
            TEST_DRIVER_ED25519_KEY_SLOT => KeyAttributes::new()
                .with_type(KeyType::EccKeyPair(EccFamily::TwistedEdwards))
                .with_bits(255)
                .with_usage(KeyUsage::SIGN_MESSAGE | KeyUsage::VERIFY_MESSAGE | KeyUsage::EXPORT)
                .with_algorithm(Algorithm::PureEddsa),
            other => {
                return Err(CryptoError::invalid_argument(
                    "builtin slot",
                    "a slot served by the test driver",
                    &other.to_string(),
                ))
            }
        }
        .with_lifetime(Lifetime::new(Persistence::READ_ONLY, Location::TEST_DRIVER));
        let material = KeyMaterial::Opaque(OpaqueHandle {
            location: Location::TEST_DRIVER,
            slot_number,
        });
        Ok((attributes, material))
    }

    fn mac_setup(
        &self,
        attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
    ) -> CryptoResult<Box<dyn MacOp>> {
        self.hooks.hit(HookCategory::Mac)?;
        Ok(Box::new(HookedMac {
            inner: self.inner.mac_setup(attributes, &self.unwrap_key(material)?, alg)?,
            hooks: Arc::clone(&self.hooks),
        }))
    }

    fn cipher_setup(
        &self,
        attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
        direction: CipherDirection,
    ) -> CryptoResult<Box<dyn CipherOp>> {
        self.hooks.hit(HookCategory::Cipher)?;
        Ok(Box::new(HookedCipher {
            inner: self
                .inner
                .cipher_setup(attributes, &self.unwrap_key(material)?, alg, direction)?,
            hooks: Arc::clone(&self.hooks),
        }))
    }

    fn aead_setup(
        &self,
        attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
        direction: CipherDirection,
    ) -> CryptoResult<Box<dyn AeadOp>> {
        self.hooks.hit(HookCategory::Aead)?;
        Ok(Box::new(HookedAead {
            inner: self
                .inner
                .aead_setup(attributes, &self.unwrap_key(material)?, alg, direction)?,
            hooks: Arc::clone(&self.hooks),
        }))
    }

    fn sign_hash(
        &self,
        attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
        hash: &[u8],
        rng: &mut dyn RandomSource,
    ) -> CryptoResult<Vec<u8>> {
        self.hooks.hit(HookCategory::Sign)?;
        let sig = self
            .inner
            .sign_hash(attributes, &self.unwrap_key(material)?, alg, hash, rng)?;
        Ok(self.hooks.override_output(HookCategory::Sign, sig))
    }

    fn verify_hash(
        &self,
        attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
        hash: &[u8],
        signature: &[u8],
    ) -> CryptoResult<()> {
        self.hooks.hit(HookCategory::Sign)?;
        self.inner
            .verify_hash(attributes, &self.unwrap_key(material)?, alg, hash, signature)
    }

    fn sign_message(
        &self,
        attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
        message: &[u8],
        rng: &mut dyn RandomSource,
    ) -> CryptoResult<Vec<u8>> {
        self.hooks.hit(HookCategory::Sign)?;
        let sig = self
            .inner
            .sign_message(attributes, &self.unwrap_key(material)?, alg, message, rng)?;
        Ok(self.hooks.override_output(HookCategory::Sign, sig))
    }

    fn verify_message(
        &self,
        attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
        message: &[u8],
        signature: &[u8],
    ) -> CryptoResult<()> {
        self.hooks.hit(HookCategory::Sign)?;
        self.inner
            .verify_message(attributes, &self.unwrap_key(material)?, alg, message, signature)
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
        self.hooks.hit(HookCategory::AsymmetricEncryption)?;
        self.inner
            .asymmetric_encrypt(attributes, &self.unwrap_key(material)?, alg, input, salt, rng)
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
        self.hooks.hit(HookCategory::AsymmetricEncryption)?;
        self.inner
            .asymmetric_decrypt(attributes, &self.unwrap_key(material)?, alg, input, salt, rng)
    }

    fn key_agreement(
        &self,
        attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
        peer_key: &[u8],
    ) -> CryptoResult<SecureBytes> {
        self.hooks.hit(HookCategory::KeyAgreement)?;
        self.inner
            .key_agreement(attributes, &self.unwrap_key(material)?, alg, peer_key)
    }
}
