/*!
 * Random Byte Sources
 *
 * The core consumes randomness through [`RandomSource`]. Production builds
 * read from the operating system or from a DRBG seeded by an injected
 * non-volatile seed; tests plug in deterministic generators from
 * [`test_rng`].
 */

use rand::{CryptoRng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex};

use crate::error::{CryptoError, CryptoResult};
use crate::storage::{KeyStorage, NV_SEED_UID};

pub mod test_rng;

pub use test_rng::{BufferRandom, PseudoRandom, ZeroRandom};

/// A source of random bytes
pub trait RandomSource: Send {
    /// Fill `buf` completely or fail without a partial guarantee
    fn get_random(&mut self, buf: &mut [u8]) -> CryptoResult<()>;

    /// Short name used in log output
    fn name(&self) -> &'static str;
}

/// Random generator shared between the facade and running operations
pub type SharedRng = Arc<Mutex<Box<dyn RandomSource>>>;

/// Wrap a source for sharing
pub fn shared(source: impl RandomSource + 'static) -> SharedRng {
    Arc::new(Mutex::new(Box::new(source)))
}

/// Fill `buf` from a shared generator
pub fn fill_random(rng: &SharedRng, buf: &mut [u8]) -> CryptoResult<()> {
    let mut source = rng.lock()?;
    source.get_random(buf)
}

/// Operating-system randomness
#[derive(Debug, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn get_random(&mut self, buf: &mut [u8]) -> CryptoResult<()> {
        getrandom::getrandom(buf).map_err(|e| CryptoError::InsufficientEntropy {
            cause: e.to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "os"
    }
}

/// DRBG seeded from the injected non-volatile entropy seed
///
/// The seed is read once from storage and compressed with SHA-256 into the
/// ChaCha20 key; the stored seed is never modified.
pub struct NvSeedRandom {
    rng: ChaCha20Rng,
}

impl NvSeedRandom {
    /// Build the generator from the seed in `storage`
    ///
    /// Fails with `InsufficientEntropy` when no seed has been injected.
    pub fn from_storage(storage: &dyn KeyStorage) -> CryptoResult<Self> {
        let info = storage.get_info(NV_SEED_UID).map_err(|e| match e {
            CryptoError::DoesNotExist { .. } => CryptoError::InsufficientEntropy {
                cause: "no entropy seed has been injected".to_string(),
            },
            other => other,
        })?;
        let seed = storage.get(NV_SEED_UID, 0, info.size)?;
        let digest = Sha256::digest(seed.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        log::debug!("NV seed generator initialised from {} seed bytes", info.size);
        Ok(Self {
            rng: ChaCha20Rng::from_seed(key),
        })
    }
}

impl RandomSource for NvSeedRandom {
    fn get_random(&mut self, buf: &mut [u8]) -> CryptoResult<()> {
        self.rng.fill_bytes(buf);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "nv-seed"
    }
}

/// Adapter presenting a [`RandomSource`] as a `rand` generator
///
/// `RngCore::fill_bytes` cannot fail, so a failing source leaves the
/// buffer zeroed and records the error; callers check
/// [`RngAdapter::finish`] after handing the adapter to a primitive.
pub struct RngAdapter<'a> {
    source: &'a mut dyn RandomSource,
    error: Option<CryptoError>,
}

impl<'a> RngAdapter<'a> {
    pub fn new(source: &'a mut dyn RandomSource) -> Self {
        Self {
            source,
            error: None,
        }
    }

    /// Surface the first error seen while the adapter was in use
    pub fn finish(self) -> CryptoResult<()> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl RngCore for RngAdapter<'_> {
    fn next_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        self.fill_bytes(&mut buf);
        u32::from_le_bytes(buf)
    }

    fn next_u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        self.fill_bytes(&mut buf);
        u64::from_le_bytes(buf)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        if let Err(err) = self.source.get_random(dest) {
            dest.iter_mut().for_each(|b| *b = 0);
            self.error.get_or_insert(err);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.source
            .get_random(dest)
            .map_err(|e| rand::Error::new(e.to_string()))
    }
}

impl CryptoRng for RngAdapter<'_> {}
