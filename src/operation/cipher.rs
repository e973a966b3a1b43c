//! Multi-part unauthenticated cipher

use crate::algorithm::{Algorithm, AlgorithmCategory};
use crate::attributes::{KeyId, KeyUsage};
use crate::client::CryptoCore;
use crate::drivers::{CipherDirection, CipherOp};
use crate::error::{CryptoError, CryptoResult};
use crate::rng::{fill_random, SharedRng};
use crate::utils::check_output;

use super::{Active, Context};

/// Streaming encryption or decryption
pub struct CipherOperation {
    ctx: Context<dyn CipherOp>,
    direction: CipherDirection,
    iv_required: bool,
    iv_set: bool,
    rng: Option<SharedRng>,
}

impl Default for CipherOperation {
    fn default() -> Self {
        Self {
            ctx: Context::Inactive,
            direction: CipherDirection::Encrypt,
            iv_required: false,
            iv_set: false,
            rng: None,
        }
    }
}

impl CipherOperation {
    /// Create an inactive operation
    pub fn new() -> Self {
        Self::default()
    }

    /// True between a successful setup and `finish` or `abort`
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

    /// Start encrypting with `key`; the key needs `ENCRYPT`
    pub fn encrypt_setup(&mut self, core: &CryptoCore, key: KeyId, alg: Algorithm) -> CryptoResult<()> {
        self.setup(core, key, alg, CipherDirection::Encrypt)
    }

    /// Start decrypting with `key`; the key needs `DECRYPT`
    pub fn decrypt_setup(&mut self, core: &CryptoCore, key: KeyId, alg: Algorithm) -> CryptoResult<()> {
        self.setup(core, key, alg, CipherDirection::Decrypt)
    }

    fn setup(&mut self, core: &CryptoCore, key: KeyId, alg: Algorithm, direction: CipherDirection) -> CryptoResult<()> {
        self.ctx.ensure_inactive("cipher setup")?;
        if alg.category() != AlgorithmCategory::Cipher {
            return Err(CryptoError::invalid_argument("algorithm", "a cipher algorithm", &alg.to_string()));
        }
        let usage = match direction {
            CipherDirection::Encrypt => KeyUsage::ENCRYPT,
            CipherDirection::Decrypt => KeyUsage::DECRYPT,
        };
        let guard = core.lock_key(key, usage, alg)?;
        let entry = core.driver_for(&guard, alg)?;
        let op = entry
            .driver
            .cipher_setup(guard.attributes(), guard.material(), alg, direction)?;
        self.ctx = Context::Active(Active {
            alg,
            entry,
            key: Some(guard),
            op,
        });
        self.direction = direction;
        self.iv_required = alg.iv_size() > 0;
        self.iv_set = false;
        self.rng = Some(core.shared_rng());
        Ok(())
    }

    /// Generate a random IV, install it and write it to `iv`
    pub fn generate_iv(&mut self, iv: &mut [u8]) -> CryptoResult<usize> {
        let alg = self
            .ctx
            .algorithm()
            .ok_or_else(|| CryptoError::bad_state("generate iv", "the operation is not active"))?;
        if self.direction != CipherDirection::Encrypt || !self.iv_required || self.iv_set {
            self.abort();
            return Err(CryptoError::bad_state("generate iv", "no IV may be generated now"));
        }
        let len = alg.iv_size();
        check_output(len, iv)?;
        let rng = self.rng.clone();
        self.ctx.step("generate iv", |active| {
            let rng = rng.ok_or_else(|| CryptoError::bad_state("generate iv", "no random source"))?;
            fill_random(&rng, &mut iv[..len])?;
            active.op.set_iv(&iv[..len])
        })?;
        self.iv_set = true;
        Ok(len)
    }

    /// Install an IV received from the peer
    ///
    /// Setting it twice is a `BadState` error.
    pub fn set_iv(&mut self, iv: &[u8]) -> CryptoResult<()> {
        self.ctx.active("set iv")?;
        if !self.iv_required || self.iv_set {
            self.abort();
            return Err(CryptoError::bad_state("set iv", "no IV may be set now"));
        }
        self.ctx.step("set iv", |active| active.op.set_iv(iv))?;
        self.iv_set = true;
        Ok(())
    }

    fn check_iv(&mut self, operation: &str) -> CryptoResult<()> {
        self.ctx.active(operation)?;
        if self.iv_required && !self.iv_set {
            self.abort();
            return Err(CryptoError::bad_state(operation, "no IV has been set"));
        }
        Ok(())
    }

    /// Process `input`, returning the number of bytes written to `output`
    pub fn update(&mut self, input: &[u8], output: &mut [u8]) -> CryptoResult<usize> {
        self.check_iv("cipher update")?;
        let required = self.ctx.active("cipher update")?.op.update_output_size(input.len());
        check_output(required, output)?;
        self.ctx.step("cipher update", |active| active.op.update(input, output))
    }

    /// Flush buffered input and padding
    pub fn finish(&mut self, output: &mut [u8]) -> CryptoResult<usize> {
        self.check_iv("cipher finish")?;
        let required = self.ctx.active("cipher finish")?.op.finish_output_size();
        check_output(required, output)?;
        let active = self.ctx.take("cipher finish")?;
        active.op.finish(output)
    }

    /// Wipe the state and release the key lock
    pub fn abort(&mut self) {
        self.ctx.abort();
        self.iv_set = false;
        self.rng = None;
    }

    /// Copy the state, leftover keystream and buffered block included,
    /// into the inactive `target`; the copy takes its own key lock
    pub fn clone_to(&self, target: &mut CipherOperation) -> CryptoResult<()> {
        self.ctx.clone_with(&mut target.ctx, |op| op.box_clone())?;
        target.direction = self.direction;
        target.iv_required = self.iv_required;
        target.iv_set = self.iv_set;
        target.rng = self.rng.clone();
        Ok(())
    }
}
