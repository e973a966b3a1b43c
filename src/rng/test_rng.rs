//! Deterministic generators for tests
//!
//! These make key generation and nonce generation reproducible. None of
//! them is suitable for production use.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use super::RandomSource;
use crate::error::{CryptoError, CryptoResult};

/// Produces only zero bytes
#[derive(Debug, Default)]
pub struct ZeroRandom;

impl RandomSource for ZeroRandom {
    fn get_random(&mut self, buf: &mut [u8]) -> CryptoResult<()> {
        buf.iter_mut().for_each(|b| *b = 0);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "zero"
    }
}

/// Replays a fixed buffer, then defers to an optional fallback
///
/// A request larger than what is left consumes the remaining bytes first
/// and takes the rest from the fallback. Without a fallback such a request
/// fails with `InsufficientEntropy`.
pub struct BufferRandom {
    data: Vec<u8>,
    position: usize,
    fallback: Option<Box<dyn RandomSource>>,
}

impl BufferRandom {
    pub fn new(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
            position: 0,
            fallback: None,
        }
    }

    pub fn with_fallback(data: &[u8], fallback: impl RandomSource + 'static) -> Self {
        Self {
            data: data.to_vec(),
            position: 0,
            fallback: Some(Box::new(fallback)),
        }
    }

    /// Bytes of the buffer not yet handed out
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }
}

impl RandomSource for BufferRandom {
    fn get_random(&mut self, buf: &mut [u8]) -> CryptoResult<()> {
        let available = self.remaining();
        if buf.len() <= available {
            buf.copy_from_slice(&self.data[self.position..self.position + buf.len()]);
            self.position += buf.len();
            return Ok(());
        }

        let fallback = self.fallback.as_mut().ok_or_else(|| CryptoError::InsufficientEntropy {
            cause: format!(
                "replay buffer exhausted: {} bytes requested, {} left",
                buf.len(),
                available
            ),
        })?;
        let (head, tail) = buf.split_at_mut(available);
        head.copy_from_slice(&self.data[self.position..]);
        self.position = self.data.len();
        fallback.get_random(tail)
    }

    fn name(&self) -> &'static str {
        "buffer"
    }
}

/// ChaCha20-based generator keyed for bit-reproducible output
pub struct PseudoRandom {
    rng: ChaCha20Rng,
}

impl PseudoRandom {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            rng: ChaCha20Rng::from_seed(seed),
        }
    }

    pub fn seed_from_u64(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for PseudoRandom {
    fn get_random(&mut self, buf: &mut [u8]) -> CryptoResult<()> {
        self.rng.fill_bytes(buf);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "pseudo"
    }
}
