//! Multi-part authenticated encryption
//!
//! Input is accumulated by the driver and released at `finish` (encrypt)
//! or `verify` (decrypt), once the tag has been computed or checked.

use crate::algorithm::{Algorithm, AlgorithmCategory};
use crate::attributes::{KeyId, KeyUsage};
use crate::client::CryptoCore;
use crate::drivers::{AeadOp, CipherDirection};
use crate::error::{CryptoError, CryptoResult};
use crate::rng::{fill_random, SharedRng};
use crate::utils::{check_output, copy_to_output};

use super::{Active, Context};

/// Streaming AEAD encryption or decryption
pub struct AeadOperation {
    ctx: Context<dyn AeadOp>,
    direction: CipherDirection,
    nonce_set: bool,
    rng: Option<SharedRng>,
}

impl Default for AeadOperation {
    fn default() -> Self {
        Self {
            ctx: Context::Inactive,
            direction: CipherDirection::Encrypt,
            nonce_set: false,
            rng: None,
        }
    }
}

impl AeadOperation {
    /// Create an inactive operation
    pub fn new() -> Self {
        Self::default()
    }

    /// True until `finish`, `verify`, `abort` or a failing step
    pub fn is_active(&self) -> bool {
        self.ctx.is_active()
    }

    /// Algorithm of the active operation
    pub fn algorithm(&self) -> Option<Algorithm> {
        self.ctx.algorithm()
    }

    /// Name of the driver servicing the operation
    pub fn driver_name(&self) -> Option<&'static str> {
        self.ctx.driver_name()
    }

    /// Start an encryption; the key needs `ENCRYPT`
    pub fn encrypt_setup(&mut self, core: &CryptoCore, key: KeyId, alg: Algorithm) -> CryptoResult<()> {
        self.setup(core, key, alg, CipherDirection::Encrypt)
    }

    /// Start a decryption; the key needs `DECRYPT`
    pub fn decrypt_setup(&mut self, core: &CryptoCore, key: KeyId, alg: Algorithm) -> CryptoResult<()> {
        self.setup(core, key, alg, CipherDirection::Decrypt)
    }

    fn setup(&mut self, core: &CryptoCore, key: KeyId, alg: Algorithm, direction: CipherDirection) -> CryptoResult<()> {
        self.ctx.ensure_inactive("aead setup")?;
        if alg.category() != AlgorithmCategory::Aead {
            return Err(CryptoError::invalid_argument("algorithm", "an AEAD algorithm", &alg.to_string()));
        }
        let usage = match direction {
            CipherDirection::Encrypt => KeyUsage::ENCRYPT,
            CipherDirection::Decrypt => KeyUsage::DECRYPT,
        };
        let guard = core.lock_key(key, usage, alg)?;
        let entry = core.driver_for(&guard, alg)?;
        let op = entry
            .driver
            .aead_setup(guard.attributes(), guard.material(), alg, direction)?;
        self.ctx = Context::Active(Active {
            alg,
            entry,
            key: Some(guard),
            op,
        });
        self.direction = direction;
        self.nonce_set = false;
        self.rng = Some(core.shared_rng());
        Ok(())
    }

    /// Generate a random nonce, install it and write it to `nonce`
    pub fn generate_nonce(&mut self, nonce: &mut [u8]) -> CryptoResult<usize> {
        let alg = self
            .ctx
            .algorithm()
            .ok_or_else(|| CryptoError::bad_state("generate nonce", "the operation is not active"))?;
        if self.direction != CipherDirection::Encrypt || self.nonce_set {
            self.abort();
            return Err(CryptoError::bad_state("generate nonce", "no nonce may be generated now"));
        }
        let len = alg.iv_size();
        check_output(len, nonce)?;
        let rng = self.rng.clone();
        self.ctx.step("generate nonce", |active| {
            let rng = rng.ok_or_else(|| CryptoError::bad_state("generate nonce", "no random source"))?;
            fill_random(&rng, &mut nonce[..len])?;
            active.op.set_nonce(&nonce[..len])
        })?;
        self.nonce_set = true;
        Ok(len)
    }

    /// Install the nonce; required before any data
    pub fn set_nonce(&mut self, nonce: &[u8]) -> CryptoResult<()> {
        self.ctx.active("set nonce")?;
        if self.nonce_set {
            self.abort();
            return Err(CryptoError::bad_state("set nonce", "a nonce is already set"));
        }
        self.ctx.step("set nonce", |active| active.op.set_nonce(nonce))?;
        self.nonce_set = true;
        Ok(())
    }

    /// Feed additional data; all of it must precede the payload
    pub fn update_ad(&mut self, ad: &[u8]) -> CryptoResult<()> {
        self.ctx.step("aead update ad", |active| active.op.update_ad(ad))
    }

    /// Feed payload
    pub fn update(&mut self, input: &[u8]) -> CryptoResult<()> {
        self.ctx.step("aead update", |active| active.op.update(input))
    }

    /// Finish encryption, writing the ciphertext and the tag
    ///
    /// Returns `(ciphertext_len, tag_len)`.
    pub fn finish(&mut self, ciphertext: &mut [u8], tag: &mut [u8]) -> CryptoResult<(usize, usize)> {
        let active = self.ctx.active("aead finish")?;
        let (body_len, tag_len) = (active.op.input_len(), active.alg.output_size());
        if self.direction != CipherDirection::Encrypt {
            self.abort();
            return Err(CryptoError::bad_state("aead finish", "the operation decrypts"));
        }
        check_output(body_len, ciphertext)?;
        check_output(tag_len, tag)?;
        let active = self.ctx.take("aead finish")?;
        let (body, computed) = active.op.finish()?;
        Ok((copy_to_output(&body, ciphertext)?, copy_to_output(&computed, tag)?))
    }

    /// Finish decryption: check `tag` and write the plaintext
    pub fn verify(&mut self, plaintext: &mut [u8], tag: &[u8]) -> CryptoResult<usize> {
        let body_len = self.ctx.active("aead verify")?.op.input_len();
        if self.direction != CipherDirection::Decrypt {
            self.abort();
            return Err(CryptoError::bad_state("aead verify", "the operation encrypts"));
        }
        check_output(body_len, plaintext)?;
        let active = self.ctx.take("aead verify")?;
        let body = active.op.verify(tag)?;
        copy_to_output(body.as_bytes(), plaintext)
    }

    /// Drop buffered input and release the key lock
    pub fn abort(&mut self) {
        self.ctx.abort();
        self.nonce_set = false;
        self.rng = None;
    }

    /// Copy the buffered state into the inactive `target`
    pub fn clone_to(&self, target: &mut AeadOperation) -> CryptoResult<()> {
        self.ctx.clone_with(&mut target.ctx, |op| op.box_clone())?;
        target.direction = self.direction;
        target.nonce_set = self.nonce_set;
        target.rng = self.rng.clone();
        Ok(())
    }
}
