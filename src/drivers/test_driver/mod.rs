/*!
 * Test Drivers
 *
 * Two drivers used to exercise dispatch without hardware:
 *
 * - [`TransparentTestDriver`] stands in for an accelerator. It is a
 *   transparent driver that forwards to the built-in software code, and
 *   when registered ahead of [`BuiltinDriver`](super::BuiltinDriver) it
 *   becomes the preferred tier.
 * - [`OpaqueTestDriver`] owns its key material behind handles at location
 *   [`Location::TEST_DRIVER`](crate::attributes::Location::TEST_DRIVER)
 *   and serves the builtin keys of the test platform.
 *
 * Both record every entry-point call in a shared [`TestDriverHooks`], and
 * a test can force a status or an output for any category.
 */

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{CryptoError, CryptoResult};

mod opaque;
mod transparent;

pub use opaque::OpaqueTestDriver;
pub use transparent::TransparentTestDriver;

/// Entry-point family a hook applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookCategory {
    Hash,
    Mac,
    Cipher,
    Aead,
    Sign,
    AsymmetricEncryption,
    KeyAgreement,
    KeyDerivation,
    KeyManagement,
}

/// Instrumentation for one category
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverHooks {
    /// Number of entry-point calls
    pub hits: u64,
    /// Status returned instead of running the operation
    pub forced_status: Option<CryptoError>,
    /// Output returned instead of the computed one
    pub forced_output: Option<Vec<u8>>,
}

/// Hook table shared by the test drivers
#[derive(Debug, Default)]
pub struct TestDriverHooks {
    hooks: Mutex<HashMap<HookCategory, DriverHooks>>,
}

impl TestDriverHooks {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<HookCategory, DriverHooks>> {
        // A panicking test must not wedge the counters for the next one
        self.hooks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a call; fails with the forced status when one is set
    pub fn hit(&self, category: HookCategory) -> CryptoResult<()> {
        let mut table = self.table();
        let entry = table.entry(category).or_default();
        entry.hits += 1;
        match &entry.forced_status {
            Some(status) => {
                log::warn!("Test driver forcing {:?} for {:?}", status.status(), category);
                Err(status.clone())
            }
            None => Ok(()),
        }
    }

    /// Replace `output` with the forced output, if one is set
    pub fn override_output(&self, category: HookCategory, output: Vec<u8>) -> Vec<u8> {
        self.table()
            .get(&category)
            .and_then(|entry| entry.forced_output.clone())
            .unwrap_or(output)
    }

    pub fn set_forced_status(&self, category: HookCategory, status: Option<CryptoError>) {
        self.table().entry(category).or_default().forced_status = status;
    }

    pub fn set_forced_output(&self, category: HookCategory, output: Option<Vec<u8>>) {
        self.table().entry(category).or_default().forced_output = output;
    }

    /// Snapshot of one category
    pub fn hooks(&self, category: HookCategory) -> DriverHooks {
        self.table().get(&category).cloned().unwrap_or_default()
    }

    pub fn hits(&self, category: HookCategory) -> u64 {
        self.hooks(category).hits
    }

    /// Clear counters and forced values of every category
    pub fn reset(&self) {
        self.table().clear();
    }
}
