//! Key derivation
//!
//! Inputs arrive step by step as bytes, integers, keys or the result of a
//! key agreement. Output is drawn in arbitrary chunks against a capacity
//! that starts at the algorithm's maximum and only ever shrinks.

use crate::algorithm::{self, Algorithm, AlgorithmCategory};
use crate::attributes::{KeyAttributes, KeyId, KeyType, KeyUsage, Location};
use crate::client::CryptoCore;
use crate::drivers::{DerivationStep, KdfOp};
use crate::error::{CryptoError, CryptoResult};
use crate::secure_memory::SecureBytes;

use super::{Active, Context};

/// Key derivation operation
#[derive(Default)]
pub struct KeyDerivationOperation {
    ctx: Context<dyn KdfOp>,
    capacity: usize,
    /// Set once the secret came from a stored key or a key agreement
    can_output_key: bool,
}

/// Key types accepted as input for `step`
fn step_accepts(step: DerivationStep, key_type: KeyType) -> bool {
    match step {
        DerivationStep::Secret => matches!(key_type, KeyType::Derive),
        DerivationStep::Password => matches!(key_type, KeyType::Password | KeyType::Derive),
        DerivationStep::Cost => false,
        DerivationStep::Salt | DerivationStep::Info | DerivationStep::Label | DerivationStep::Seed => {
            matches!(key_type, KeyType::RawData | KeyType::Derive)
        }
    }
}

impl KeyDerivationOperation {
    /// Create an inactive operation
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.ctx.is_active()
    }

    /// Algorithm of the active derivation, if any
    pub fn algorithm(&self) -> Option<Algorithm> {
        self.ctx.algorithm()
    }

    /// Name of the driver the derivation was dispatched to
    pub fn driver_name(&self) -> Option<&'static str> {
        self.ctx.driver_name()
    }

    /// Start a derivation; key derivation always runs on a local driver
    pub fn setup(&mut self, core: &CryptoCore, alg: Algorithm) -> CryptoResult<()> {
        self.ctx.ensure_inactive("key derivation setup")?;
        let info = algorithm::lookup(alg)?;
        if info.category != AlgorithmCategory::KeyDerivation {
            return Err(CryptoError::invalid_argument(
                "algorithm",
                "a key derivation algorithm",
                &alg.to_string(),
            ));
        }
        let entry = core
            .drivers()
            .resolve(AlgorithmCategory::KeyDerivation, alg, Location::LOCAL_STORAGE)?;
        let op = entry.driver.key_derivation_setup(alg)?;
        self.capacity = op.max_capacity();
        self.can_output_key = false;
        self.ctx = Context::Active(Active {
            alg,
            entry,
            key: None,
            op,
        });
        Ok(())
    }

    /// Bytes that can still be drawn
    pub fn capacity(&self) -> CryptoResult<usize> {
        self.ctx.active("key derivation capacity")?;
        Ok(self.capacity)
    }

    /// Lower the capacity; raising it is rejected
    pub fn set_capacity(&mut self, capacity: usize) -> CryptoResult<()> {
        self.ctx.active("key derivation set capacity")?;
        if capacity > self.capacity {
            return Err(CryptoError::invalid_argument(
                "capacity",
                &format!("at most {}", self.capacity),
                &capacity.to_string(),
            ));
        }
        self.capacity = capacity;
        Ok(())
    }

    /// Feed caller-supplied bytes as `step`
    ///
    /// A secret supplied this way can only be drawn with `output_bytes`.
    pub fn input_bytes(&mut self, step: DerivationStep, data: &[u8]) -> CryptoResult<()> {
        self.ctx
            .step("key derivation input", |active| active.op.input_bytes(step, data))
    }

    /// Feed an integer parameter such as the PBKDF2 iteration count
    pub fn input_integer(&mut self, step: DerivationStep, value: u64) -> CryptoResult<()> {
        self.ctx
            .step("key derivation input", |active| active.op.input_integer(step, value))
    }

    /// Feed the material of a stored key
    ///
    /// The key needs `DERIVE` usage and a policy permitting this
    /// derivation. Opaque keys cannot feed a software derivation.
    pub fn input_key(&mut self, core: &CryptoCore, step: DerivationStep, key: KeyId) -> CryptoResult<()> {
        let alg = self
            .ctx
            .algorithm()
            .ok_or_else(|| CryptoError::bad_state("key derivation input", "the operation is not active"))?;
        let guard = match core.lock_key(key, KeyUsage::DERIVE, alg) {
            Ok(guard) => guard,
            Err(e) => {
                self.abort();
                return Err(e);
            }
        };
        let key_type = guard.attributes().key_type();
        self.ctx.step("key derivation input", |active| {
            if !step_accepts(step, key_type) {
                return Err(CryptoError::invalid_argument(
                    "key type",
                    &format!("a key usable as {:?}", step),
                    &format!("{:?}", key_type),
                ));
            }
            if guard.material().is_opaque() {
                return Err(CryptoError::not_supported("opaque keys as key derivation input"));
            }
            active.op.input_bytes(step, guard.material().raw()?)
        })?;
        if matches!(step, DerivationStep::Secret | DerivationStep::Password) && key_type == KeyType::Derive {
            self.can_output_key = true;
        }
        Ok(())
    }

    /// Run a raw key agreement and feed the shared secret as `step`
    ///
    /// The private key needs `DERIVE` usage and a policy permitting ECDH.
    pub fn key_agreement(
        &mut self,
        core: &CryptoCore,
        step: DerivationStep,
        private_key: KeyId,
        peer_key: &[u8],
    ) -> CryptoResult<()> {
        self.ctx.active("key derivation key agreement")?;
        let shared = if step != DerivationStep::Secret {
            Err(CryptoError::invalid_argument(
                "derivation step",
                "Secret",
                &format!("{:?}", step),
            ))
        } else {
            core.agree(private_key, KeyUsage::DERIVE, Algorithm::Ecdh, peer_key)
        };
        let shared: SecureBytes = match shared {
            Ok(shared) => shared,
            Err(e) => {
                self.abort();
                return Err(e);
            }
        };
        self.ctx.step("key derivation key agreement", |active| {
            active.op.input_bytes(step, shared.as_bytes())
        })?;
        self.can_output_key = true;
        Ok(())
    }

    /// Draw `out.len()` bytes
    ///
    /// Asking for more than the remaining capacity drains it and fails
    /// with `InsufficientData`; the operation stays active.
    pub fn output_bytes(&mut self, out: &mut [u8]) -> CryptoResult<()> {
        let ready = self.ctx.active("key derivation output")?.op.ready();
        if !ready {
            return Err(CryptoError::bad_state("key derivation output", "required inputs are missing"));
        }
        if out.len() > self.capacity {
            let remaining = self.capacity;
            self.capacity = 0;
            return Err(CryptoError::InsufficientData {
                requested: out.len(),
                remaining,
            });
        }
        self.ctx.step("key derivation output", |active| active.op.output(out))?;
        self.capacity -= out.len();
        Ok(())
    }

    /// Draw enough bytes for a key described by `attributes` and store it
    ///
    /// Only key types whose material is a plain byte string can be derived.
    /// The secret must have been fed from a `DERIVE` key or a key
    /// agreement; a secret given as bytes yields `NotPermitted`.
    pub fn output_key(&mut self, core: &CryptoCore, attributes: &KeyAttributes) -> CryptoResult<KeyId> {
        self.ctx.active("key derivation output key")?;
        if !self.can_output_key {
            return Err(CryptoError::not_permitted(
                "key derivation output key",
                "the secret was not supplied as a key",
            ));
        }
        let key_type = attributes.key_type();
        if key_type.is_asymmetric() {
            return Err(CryptoError::not_supported(format!("deriving {:?} keys", key_type)));
        }
        let bits = attributes.bits();
        if bits == 0 || bits % 8 != 0 {
            return Err(CryptoError::invalid_argument(
                "key bits",
                "a non-zero multiple of 8",
                &bits.to_string(),
            ));
        }
        let mut material = SecureBytes::zeroed(bits / 8);
        self.output_bytes(material.as_bytes_mut())?;
        core.import_key(attributes, material.as_bytes())
    }

    /// Abandon the derivation and release its key lock, if any
    pub fn abort(&mut self) {
        self.ctx.abort();
        self.capacity = 0;
        self.can_output_key = false;
    }

    /// Copy the derivation state, remaining capacity included, into an
    /// inactive `target`
    pub fn clone_to(&self, target: &mut KeyDerivationOperation) -> CryptoResult<()> {
        self.ctx.clone_with(&mut target.ctx, |op| op.box_clone())?;
        target.capacity = self.capacity;
        target.can_output_key = self.can_output_key;
        Ok(())
    }
}
