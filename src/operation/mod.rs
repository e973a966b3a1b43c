/*!
 * Multi-part Operation Contexts
 *
 * One context type per algorithm family. Each is either inactive or
 * active; an active context holds the algorithm, the driver entry chosen
 * at setup, the lock on the key it uses (if any) and the driver's boxed
 * streaming state. The entry never changes until the context returns to
 * inactive, so exactly one backend services an operation.
 *
 * State machine shared by every family:
 *
 * - `setup` on an active context fails with `BadState`.
 * - `update`-style calls on an inactive context fail with `BadState`.
 * - A failing call aborts the operation, except `BufferTooSmall`, which is
 *   detected before anything is written and leaves the context active.
 * - `abort` is always allowed and releases the key lock.
 */

use crate::algorithm::Algorithm;
use crate::drivers::DriverEntry;
use crate::error::{CryptoError, CryptoResult};
use crate::slots::KeyGuard;

mod aead;
mod cipher;
mod hash;
mod kdf;
mod mac;

pub use aead::AeadOperation;
pub use cipher::CipherOperation;
pub use hash::HashOperation;
pub use kdf::KeyDerivationOperation;
pub use mac::MacOperation;

/// Everything an active context owns
pub(crate) struct Active<Op: ?Sized> {
    pub(crate) alg: Algorithm,
    pub(crate) entry: DriverEntry,
    pub(crate) key: Option<KeyGuard>,
    pub(crate) op: Box<Op>,
}

impl<Op: ?Sized> Active<Op> {
    /// Same binding with a freshly cloned driver state and a new key lock
    fn rebind(&self, op: Box<Op>) -> CryptoResult<Active<Op>> {
        let key = match &self.key {
            Some(guard) => Some(guard.try_clone()?),
            None => None,
        };
        Ok(Active {
            alg: self.alg,
            entry: self.entry.clone(),
            key,
            op,
        })
    }
}

/// Inactive / active state of one context
pub(crate) enum Context<Op: ?Sized> {
    Inactive,
    Active(Active<Op>),
}

impl<Op: ?Sized> Default for Context<Op> {
    fn default() -> Self {
        Context::Inactive
    }
}

impl<Op: ?Sized> Context<Op> {
    pub(crate) fn is_active(&self) -> bool {
        matches!(self, Context::Active(_))
    }

    pub(crate) fn algorithm(&self) -> Option<Algorithm> {
        match self {
            Context::Active(active) => Some(active.alg),
            Context::Inactive => None,
        }
    }

    pub(crate) fn driver_name(&self) -> Option<&'static str> {
        match self {
            Context::Active(active) => Some(active.entry.driver.name()),
            Context::Inactive => None,
        }
    }

    pub(crate) fn ensure_inactive(&self, operation: &str) -> CryptoResult<()> {
        if self.is_active() {
            return Err(CryptoError::bad_state(operation, "the operation is already active"));
        }
        Ok(())
    }

    pub(crate) fn active(&self, operation: &str) -> CryptoResult<&Active<Op>> {
        match self {
            Context::Active(active) => Ok(active),
            Context::Inactive => Err(CryptoError::bad_state(operation, "the operation is not active")),
        }
    }

    pub(crate) fn active_mut(&mut self, operation: &str) -> CryptoResult<&mut Active<Op>> {
        match self {
            Context::Active(active) => Ok(active),
            Context::Inactive => Err(CryptoError::bad_state(operation, "the operation is not active")),
        }
    }

    /// Run a step on the active state, aborting if it fails
    ///
    /// `BufferTooSmall` keeps the operation alive.
    pub(crate) fn step<T>(
        &mut self,
        operation: &str,
        f: impl FnOnce(&mut Active<Op>) -> CryptoResult<T>,
    ) -> CryptoResult<T> {
        let result = f(self.active_mut(operation)?);
        if let Err(e) = &result {
            if !matches!(e, CryptoError::BufferTooSmall { .. }) {
                log::debug!("{} failed, aborting operation: {}", operation, e);
                self.abort();
            }
        }
        result
    }

    /// Move the active state out, leaving the context inactive
    pub(crate) fn take(&mut self, operation: &str) -> CryptoResult<Active<Op>> {
        match std::mem::take(self) {
            Context::Active(active) => Ok(active),
            Context::Inactive => Err(CryptoError::bad_state(operation, "the operation is not active")),
        }
    }

    /// Drop driver state and release the key lock
    pub(crate) fn abort(&mut self) {
        *self = Context::Inactive;
    }

    /// Duplicate into `target`, which must be inactive
    pub(crate) fn clone_with(
        &self,
        target: &mut Context<Op>,
        clone_op: impl FnOnce(&Op) -> CryptoResult<Box<Op>>,
    ) -> CryptoResult<()> {
        let source = self.active("clone")?;
        target.ensure_inactive("clone")?;
        let op = clone_op(source.op.as_ref())?;
        *target = Context::Active(source.rebind(op)?);
        Ok(())
    }
}
