//! Multi-part hash

use crate::algorithm::{self, Algorithm, AlgorithmCategory};
use crate::attributes::Location;
use crate::client::CryptoCore;
use crate::drivers::HashOp;
use crate::error::{CryptoError, CryptoResult};
use crate::utils::{check_output, constant_time_eq, copy_to_output};

use super::{Active, Context};

/// Streaming hash computation
///
/// # Example
///
/// ```
/// use qasa_psa::prelude::*;
///
/// let core = CryptoCore::new(CoreConfig::default()).unwrap();
/// let mut op = HashOperation::new();
/// op.setup(&core, Algorithm::Hash(HashAlgorithm::Sha256)).unwrap();
/// op.update(b"ab").unwrap();
/// op.update(b"c").unwrap();
/// let mut digest = [0u8; 32];
/// assert_eq!(op.finish(&mut digest).unwrap(), 32);
/// ```
#[derive(Default)]
pub struct HashOperation {
    ctx: Context<dyn HashOp>,
}

impl HashOperation {
    pub fn new() -> Self {
        Self::default()
    }

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

    pub fn setup(&mut self, core: &CryptoCore, alg: Algorithm) -> CryptoResult<()> {
        self.ctx.ensure_inactive("hash setup")?;
        let info = algorithm::lookup(alg)?;
        let hash = match (info.category, alg.hash()) {
            (AlgorithmCategory::Hash, Some(hash)) => hash,
            _ => {
                return Err(CryptoError::invalid_argument(
                    "algorithm",
                    "a hash algorithm",
                    &alg.to_string(),
                ))
            }
        };
        let entry = core
            .drivers()
            .resolve(AlgorithmCategory::Hash, alg, Location::LOCAL_STORAGE)?;
        let op = entry.driver.hash_setup(hash)?;
        self.ctx = Context::Active(Active {
            alg,
            entry,
            key: None,
            op,
        });
        Ok(())
    }

    pub fn update(&mut self, input: &[u8]) -> CryptoResult<()> {
        self.ctx.step("hash update", |active| active.op.update(input))
    }

    /// Write the digest to `out`, returning its length
    pub fn finish(&mut self, out: &mut [u8]) -> CryptoResult<usize> {
        let required = self.ctx.active("hash finish")?.alg.output_size();
        check_output(required, out)?;
        let active = self.ctx.take("hash finish")?;
        let digest = active.op.finish()?;
        copy_to_output(&digest, out)
    }

    /// Compare the digest against `expected`
    pub fn verify(&mut self, expected: &[u8]) -> CryptoResult<()> {
        let active = self.ctx.take("hash verify")?;
        let digest = active.op.finish()?;
        if constant_time_eq(&digest, expected) {
            Ok(())
        } else {
            Err(CryptoError::InvalidSignature {
                operation: "hash verify".to_string(),
            })
        }
    }

    pub fn abort(&mut self) {
        self.ctx.abort();
    }

    /// Copy the state of this operation into the inactive `target`
    pub fn clone_to(&self, target: &mut HashOperation) -> CryptoResult<()> {
        self.ctx.clone_with(&mut target.ctx, |op| op.box_clone())
    }

    /// Fresh operation with a copy of this one's state
    pub fn try_clone(&self) -> CryptoResult<HashOperation> {
        let mut target = HashOperation::new();
        self.clone_to(&mut target)?;
        Ok(target)
    }
}
