//! Accelerator stand-in: a transparent driver with instrumented entry points

use std::sync::Arc;

use super::{HookCategory, TestDriverHooks};
use crate::algorithm::{Algorithm, HashAlgorithm};
use crate::attributes::{KeyAttributes, Location};
use crate::drivers::{
    AeadOp, BuiltinDriver, CipherDirection, CipherOp, CryptoDriver, DerivationStep, DriverKind, HashOp, KdfOp, MacOp,
};
use crate::error::CryptoResult;
use crate::rng::RandomSource;
use crate::secure_memory::SecureBytes;
use crate::slots::KeyMaterial;

pub(super) struct HookedHash {
    pub(super) inner: Box<dyn HashOp>,
    pub(super) hooks: Arc<TestDriverHooks>,
}

impl HashOp for HookedHash {
    fn update(&mut self, input: &[u8]) -> CryptoResult<()> {
        self.hooks.hit(HookCategory::Hash)?;
        self.inner.update(input)
    }

    fn finish(self: Box<Self>) -> CryptoResult<Vec<u8>> {
        let HookedHash { inner, hooks } = *self;
        hooks.hit(HookCategory::Hash)?;
        let digest = inner.finish()?;
        Ok(hooks.override_output(HookCategory::Hash, digest))
    }

    fn box_clone(&self) -> CryptoResult<Box<dyn HashOp>> {
        Ok(Box::new(HookedHash {
            inner: self.inner.box_clone()?,
            hooks: Arc::clone(&self.hooks),
        }))
    }
}

pub(super) struct HookedMac {
    pub(super) inner: Box<dyn MacOp>,
    pub(super) hooks: Arc<TestDriverHooks>,
}

impl MacOp for HookedMac {
    fn update(&mut self, input: &[u8]) -> CryptoResult<()> {
        self.hooks.hit(HookCategory::Mac)?;
        self.inner.update(input)
    }

    fn finish(self: Box<Self>) -> CryptoResult<Vec<u8>> {
        let HookedMac { inner, hooks } = *self;
        hooks.hit(HookCategory::Mac)?;
        let tag = inner.finish()?;
        Ok(hooks.override_output(HookCategory::Mac, tag))
    }

    fn box_clone(&self) -> CryptoResult<Box<dyn MacOp>> {
        Ok(Box::new(HookedMac {
            inner: self.inner.box_clone()?,
            hooks: Arc::clone(&self.hooks),
        }))
    }
}

pub(super) struct HookedCipher {
    pub(super) inner: Box<dyn CipherOp>,
    pub(super) hooks: Arc<TestDriverHooks>,
}

impl CipherOp for HookedCipher {
    fn set_iv(&mut self, iv: &[u8]) -> CryptoResult<()> {
        self.hooks.hit(HookCategory::Cipher)?;
        self.inner.set_iv(iv)
    }

    fn update_output_size(&self, input_len: usize) -> usize {
        self.inner.update_output_size(input_len)
    }

    fn update(&mut self, input: &[u8], output: &mut [u8]) -> CryptoResult<usize> {
        self.hooks.hit(HookCategory::Cipher)?;
        self.inner.update(input, output)
    }

    fn finish_output_size(&self) -> usize {
        self.inner.finish_output_size()
    }

    fn finish(self: Box<Self>, output: &mut [u8]) -> CryptoResult<usize> {
        let HookedCipher { inner, hooks } = *self;
        hooks.hit(HookCategory::Cipher)?;
        inner.finish(output)
    }

    fn box_clone(&self) -> CryptoResult<Box<dyn CipherOp>> {
        Ok(Box::new(HookedCipher {
            inner: self.inner.box_clone()?,
            hooks: Arc::clone(&self.hooks),
        }))
    }
}

pub(super) struct HookedAead {
    pub(super) inner: Box<dyn AeadOp>,
    pub(super) hooks: Arc<TestDriverHooks>,
}

impl AeadOp for HookedAead {
    fn set_nonce(&mut self, nonce: &[u8]) -> CryptoResult<()> {
        self.hooks.hit(HookCategory::Aead)?;
        self.inner.set_nonce(nonce)
    }

    fn update_ad(&mut self, ad: &[u8]) -> CryptoResult<()> {
        self.hooks.hit(HookCategory::Aead)?;
        self.inner.update_ad(ad)
    }

    fn update(&mut self, input: &[u8]) -> CryptoResult<()> {
        self.hooks.hit(HookCategory::Aead)?;
        self.inner.update(input)
    }

    fn input_len(&self) -> usize {
        self.inner.input_len()
    }

    fn finish(self: Box<Self>) -> CryptoResult<(Vec<u8>, Vec<u8>)> {
        let HookedAead { inner, hooks } = *self;
        hooks.hit(HookCategory::Aead)?;
        inner.finish()
    }

    fn verify(self: Box<Self>, tag: &[u8]) -> CryptoResult<SecureBytes> {
        let HookedAead { inner, hooks } = *self;
        hooks.hit(HookCategory::Aead)?;
        inner.verify(tag)
    }

    fn box_clone(&self) -> CryptoResult<Box<dyn AeadOp>> {
        Ok(Box::new(HookedAead {
            inner: self.inner.box_clone()?,
            hooks: Arc::clone(&self.hooks),
        }))
    }
}

pub(super) struct HookedKdf {
    pub(super) inner: Box<dyn KdfOp>,
    pub(super) hooks: Arc<TestDriverHooks>,
}

impl KdfOp for HookedKdf {
    fn input_bytes(&mut self, step: DerivationStep, data: &[u8]) -> CryptoResult<()> {
        self.hooks.hit(HookCategory::KeyDerivation)?;
        self.inner.input_bytes(step, data)
    }

    fn input_integer(&mut self, step: DerivationStep, value: u64) -> CryptoResult<()> {
        self.hooks.hit(HookCategory::KeyDerivation)?;
        self.inner.input_integer(step, value)
    }

    fn ready(&self) -> bool {
        self.inner.ready()
    }

    fn max_capacity(&self) -> usize {
        self.inner.max_capacity()
    }

    fn output(&mut self, out: &mut [u8]) -> CryptoResult<()> {
        self.hooks.hit(HookCategory::KeyDerivation)?;
        self.inner.output(out)
    }

    fn box_clone(&self) -> CryptoResult<Box<dyn KdfOp>> {
        Ok(Box::new(HookedKdf {
            inner: self.inner.box_clone()?,
            hooks: Arc::clone(&self.hooks),
        }))
    }
}

/// Transparent driver preferred over the built-in one when registered first
pub struct TransparentTestDriver {
    inner: BuiltinDriver,
    hooks: Arc<TestDriverHooks>,
}

impl TransparentTestDriver {
    pub fn new(hooks: Arc<TestDriverHooks>) -> Self {
        Self {
            inner: BuiltinDriver::new(),
            hooks,
        }
    }

    pub fn hooks(&self) -> &Arc<TestDriverHooks> {
        &self.hooks
    }
}

impl CryptoDriver for TransparentTestDriver {
    fn name(&self) -> &'static str {
        "test-accelerator"
    }

    fn kind(&self) -> DriverKind {
        DriverKind::Transparent
    }

    fn location(&self) -> Location {
        Location::LOCAL_STORAGE
    }

    fn supports(&self, alg: Algorithm) -> bool {
        self.inner.supports(alg)
    }

    fn import_key(&self, attributes: &KeyAttributes, data: &[u8]) -> CryptoResult<(KeyMaterial, usize)> {
        self.hooks.hit(HookCategory::KeyManagement)?;
        self.inner.import_key(attributes, data)
    }

    fn generate_key(&self, attributes: &KeyAttributes, rng: &mut dyn RandomSource) -> CryptoResult<KeyMaterial> {
        self.hooks.hit(HookCategory::KeyManagement)?;
        self.inner.generate_key(attributes, rng)
    }

    fn export_key(&self, attributes: &KeyAttributes, material: &KeyMaterial) -> CryptoResult<SecureBytes> {
        self.hooks.hit(HookCategory::KeyManagement)?;
        self.inner.export_key(attributes, material)
    }

    fn export_public_key(&self, attributes: &KeyAttributes, material: &KeyMaterial) -> CryptoResult<Vec<u8>> {
        self.hooks.hit(HookCategory::KeyManagement)?;
        self.inner.export_public_key(attributes, material)
    }

    fn copy_key(&self, attributes: &KeyAttributes, material: &KeyMaterial) -> CryptoResult<KeyMaterial> {
        self.hooks.hit(HookCategory::KeyManagement)?;
        self.inner.copy_key(attributes, material)
    }

    fn hash_setup(&self, alg: HashAlgorithm) -> CryptoResult<Box<dyn HashOp>> {
        self.hooks.hit(HookCategory::Hash)?;
        Ok(Box::new(HookedHash {
            inner: self.inner.hash_setup(alg)?,
            hooks: Arc::clone(&self.hooks),
        }))
    }

    fn mac_setup(
        &self,
        attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
    ) -> CryptoResult<Box<dyn MacOp>> {
        self.hooks.hit(HookCategory::Mac)?;
        Ok(Box::new(HookedMac {
            inner: self.inner.mac_setup(attributes, material, alg)?,
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
            inner: self.inner.cipher_setup(attributes, material, alg, direction)?,
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
            inner: self.inner.aead_setup(attributes, material, alg, direction)?,
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
        let sig = self.inner.sign_hash(attributes, material, alg, hash, rng)?;
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
        self.inner.verify_hash(attributes, material, alg, hash, signature)
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
        let sig = self.inner.sign_message(attributes, material, alg, message, rng)?;
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
        self.inner.verify_message(attributes, material, alg, message, signature)
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
        self.inner.asymmetric_encrypt(attributes, material, alg, input, salt, rng)
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
        self.inner.asymmetric_decrypt(attributes, material, alg, input, salt, rng)
    }

    fn key_agreement(
        &self,
        attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
        peer_key: &[u8],
    ) -> CryptoResult<SecureBytes> {
        self.hooks.hit(HookCategory::KeyAgreement)?;
        self.inner.key_agreement(attributes, material, alg, peer_key)
    }

    fn key_derivation_setup(&self, alg: Algorithm) -> CryptoResult<Box<dyn KdfOp>> {
        self.hooks.hit(HookCategory::KeyDerivation)?;
        Ok(Box::new(HookedKdf {
            inner: self.inner.key_derivation_setup(alg)?,
            hooks: Arc::clone(&self.hooks),
        }))
    }
}
