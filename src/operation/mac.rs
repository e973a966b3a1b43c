//! Multi-part MAC

use crate::algorithm::{Algorithm, AlgorithmCategory};
use crate::attributes::{KeyId, KeyUsage};
use crate::client::CryptoCore;
use crate::drivers::MacOp;
use crate::error::{CryptoError, CryptoResult};
use crate::utils::{check_output, constant_time_eq, copy_to_output};

use super::{Active, Context};

/// Streaming MAC computation or verification
#[derive(Default)]
pub struct MacOperation {
    ctx: Context<dyn MacOp>,
    verifying: bool,
}

impl MacOperation {
    /// Create an inactive operation
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a sign or verify operation is in progress
    pub fn is_active(&self) -> bool {
        self.ctx.is_active()
    }

    pub fn algorithm(&self) -> Option<Algorithm> {
        self.ctx.algorithm()
    }

    /// Name of the driver servicing the operation
    pub fn driver_name(&self) -> Option<&'static str> {
        self.ctx.driver_name()
    }

    /// Start computing a MAC; the key needs `SIGN_MESSAGE`
    pub fn sign_setup(&mut self, core: &CryptoCore, key: KeyId, alg: Algorithm) -> CryptoResult<()> {
        self.setup(core, key, alg, false)
    }

    /// Start verifying a MAC; the key needs `VERIFY_MESSAGE`
    pub fn verify_setup(&mut self, core: &CryptoCore, key: KeyId, alg: Algorithm) -> CryptoResult<()> {
        self.setup(core, key, alg, true)
    }

    fn setup(&mut self, core: &CryptoCore, key: KeyId, alg: Algorithm, verifying: bool) -> CryptoResult<()> {
        self.ctx.ensure_inactive("mac setup")?;
        if alg.category() != AlgorithmCategory::Mac {
            return Err(CryptoError::invalid_argument("algorithm", "a MAC algorithm", &alg.to_string()));
        }
        let usage = if verifying {
            KeyUsage::VERIFY_MESSAGE
        } else {
            KeyUsage::SIGN_MESSAGE
        };
        let guard = core.lock_key(key, usage, alg)?;
        let entry = core.driver_for(&guard, alg)?;
        let op = entry.driver.mac_setup(guard.attributes(), guard.material(), alg)?;
        self.ctx = Context::Active(Active {
            alg,
            entry,
            key: Some(guard),
            op,
        });
        self.verifying = verifying;
        Ok(())
    }

    /// Feed more message bytes
    pub fn update(&mut self, input: &[u8]) -> CryptoResult<()> {
        self.ctx.step("mac update", |active| active.op.update(input))
    }

    /// Finish a sign operation, writing the MAC to `out`
    pub fn sign_finish(&mut self, out: &mut [u8]) -> CryptoResult<usize> {
        let required = self.ctx.active("mac sign finish")?.alg.output_size();
        if self.verifying {
            self.ctx.abort();
            return Err(CryptoError::bad_state("mac sign finish", "the operation was set up to verify"));
        }
        check_output(required, out)?;
        let active = self.ctx.take("mac sign finish")?;
        let mac = active.op.finish()?;
        copy_to_output(&mac, out)
    }

    /// Finish a verify operation, comparing against `expected`
    pub fn verify_finish(&mut self, expected: &[u8]) -> CryptoResult<()> {
        let active = self.ctx.take("mac verify finish")?;
        if !self.verifying {
            return Err(CryptoError::bad_state("mac verify finish", "the operation was set up to sign"));
        }
        let mac = active.op.finish()?;
        if constant_time_eq(&mac, expected) {
            Ok(())
        } else {
            Err(CryptoError::InvalidSignature {
                operation: "mac verify".to_string(),
            })
        }
    }

    /// Wipe the state and release the key lock
    pub fn abort(&mut self) {
        self.ctx.abort();
    }

    /// Copy the state into the inactive `target`; the copy holds its own
    /// key lock and keeps the sign/verify direction
    pub fn clone_to(&self, target: &mut MacOperation) -> CryptoResult<()> {
        self.ctx.clone_with(&mut target.ctx, |op| op.box_clone())?;
        target.verifying = self.verifying;
        Ok(())
    }
}
