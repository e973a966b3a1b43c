/*!
 * QaSa PSA Crypto Core
 *
 * A cryptographic services layer in the style of the PSA Crypto API.
 * Callers hash, encrypt, sign, derive and agree on keys without knowing
 * whether a built-in software driver or an accelerator does the work.
 *
 * The core is built from:
 *
 * - an algorithm capability registry ([`algorithm`])
 * - a driver table dispatching to transparent and opaque drivers ([`drivers`])
 * - a key slot store owning all key material behind numeric ids ([`slots`])
 * - multi-part operation contexts ([`operation`])
 * - the client facade [`CryptoCore`]
 *
 * # Example
 *
 * ```
 * use qasa_psa::prelude::*;
 *
 * fn main() -> Result<(), CryptoError> {
 *     let core = CryptoCore::new(CoreConfig::default())?;
 *     let attrs = KeyAttributes::new()
 *         .with_type(KeyType::Aes)
 *         .with_bits(256)
 *         .with_usage(KeyUsage::ENCRYPT | KeyUsage::DECRYPT)
 *         .with_algorithm(Algorithm::Ctr);
 *     let key = core.generate_key(&attrs)?;
 *
 *     let mut ciphertext = [0u8; 16 + 5];
 *     let len = core.cipher_encrypt(key, Algorithm::Ctr, b"hello", &mut ciphertext)?;
 *     let mut plaintext = [0u8; 5];
 *     core.cipher_decrypt(key, Algorithm::Ctr, &ciphertext[..len], &mut plaintext)?;
 *     assert_eq!(&plaintext, b"hello");
 *
 *     core.destroy_key(key)?;
 *     Ok(())
 * }
 * ```
 */

use std::sync::OnceLock;

/// Algorithm identifiers and capability metadata
pub mod algorithm;

/// Key attributes, usage flags, lifetimes and identifiers
pub mod attributes;

/// Client facade
pub mod client;

/// Core configuration
pub mod config;

/// Driver interface, driver table and the bundled drivers
pub mod drivers;

/// Common error types
pub mod error;

/// Multi-part operation contexts
pub mod operation;

/// Random byte sources
pub mod rng;

/// Zeroizing buffers for key material
pub mod secure_memory;

/// Key slot store
pub mod slots;

/// Persistent storage collaborator
pub mod storage;

/// Utilities for cryptographic operations
pub mod utils;

pub use client::CryptoCore;
pub use config::CoreConfig;
pub use error::{CryptoError, CryptoResult};

static CORE: OnceLock<CryptoCore> = OnceLock::new();

/// Initialise the process-wide crypto core
///
/// The first successful call fixes the configuration; later calls return
/// the existing instance and ignore `config`.
///
/// # Example
///
/// ```
/// use qasa_psa::prelude::*;
///
/// fn main() -> Result<(), CryptoError> {
///     let core = qasa_psa::init(CoreConfig::default())?;
///     let mut random = [0u8; 16];
///     core.generate_random(&mut random)?;
///     Ok(())
/// }
/// ```
pub fn init(config: CoreConfig) -> CryptoResult<&'static CryptoCore> {
    if let Some(core) = CORE.get() {
        return Ok(core);
    }
    let core = CryptoCore::new(config)?;
    Ok(CORE.get_or_init(|| core))
}

/// The process-wide crypto core, failing with `BadState` before [`init`]
pub fn core() -> CryptoResult<&'static CryptoCore> {
    CORE.get()
        .ok_or_else(|| CryptoError::bad_state("core", "the crypto core has not been initialised"))
}

/// The types most callers need
pub mod prelude {
    pub use crate::algorithm::{Algorithm, AlgorithmCategory, HashAlgorithm};
    pub use crate::attributes::{
        EccFamily, KeyAttributes, KeyId, KeyType, KeyUsage, Lifetime, Location, Persistence,
    };
    pub use crate::client::CryptoCore;
    pub use crate::config::{CoreConfig, DriverConfig, RngConfig, StorageConfig};
    pub use crate::drivers::{DerivationStep, HookCategory};
    pub use crate::error::{CryptoError, CryptoResult};
    pub use crate::operation::{
        AeadOperation, CipherOperation, HashOperation, KeyDerivationOperation, MacOperation,
    };
    pub use crate::secure_memory::SecureBytes;
    pub use crate::slots::SlotStats;
}
