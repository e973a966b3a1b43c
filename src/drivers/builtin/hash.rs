//! SHA-2 and SHA-3 hashing

use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use sha3::{Sha3_256, Sha3_384, Sha3_512};

use crate::algorithm::HashAlgorithm;
use crate::drivers::HashOp;
use crate::error::{CryptoError, CryptoResult};

/// Run `$body` with `$D` bound to the digest type of a hash algorithm
///
/// Evaluates to the body's `CryptoResult`; the `Any` wildcard yields
/// `InvalidArgument`.
macro_rules! with_hash {
    ($alg:expr, |$D:ident| $body:expr) => {
        match $alg {
            $crate::algorithm::HashAlgorithm::Sha224 => {
                type $D = sha2::Sha224;
                $body
            }
            $crate::algorithm::HashAlgorithm::Sha256 => {
                type $D = sha2::Sha256;
                $body
            }
            $crate::algorithm::HashAlgorithm::Sha384 => {
                type $D = sha2::Sha384;
                $body
            }
            $crate::algorithm::HashAlgorithm::Sha512 => {
                type $D = sha2::Sha512;
                $body
            }
            $crate::algorithm::HashAlgorithm::Sha3_256 => {
                type $D = sha3::Sha3_256;
                $body
            }
            $crate::algorithm::HashAlgorithm::Sha3_384 => {
                type $D = sha3::Sha3_384;
                $body
            }
            $crate::algorithm::HashAlgorithm::Sha3_512 => {
                type $D = sha3::Sha3_512;
                $body
            }
            $crate::algorithm::HashAlgorithm::Any => Err($crate::error::CryptoError::invalid_argument(
                "hash algorithm",
                "a concrete hash",
                "Any",
            )),
        }
    };
}

pub(crate) use with_hash;

/// Hash state of the built-in driver
#[derive(Clone)]
pub enum BuiltinHash {
    Sha224(Sha224),
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
    Sha3_256(Sha3_256),
    Sha3_384(Sha3_384),
    Sha3_512(Sha3_512),
}

impl BuiltinHash {
    pub fn new(alg: HashAlgorithm) -> CryptoResult<Self> {
        Ok(match alg {
            HashAlgorithm::Sha224 => BuiltinHash::Sha224(Sha224::new()),
            HashAlgorithm::Sha256 => BuiltinHash::Sha256(Sha256::new()),
            HashAlgorithm::Sha384 => BuiltinHash::Sha384(Sha384::new()),
            HashAlgorithm::Sha512 => BuiltinHash::Sha512(Sha512::new()),
            HashAlgorithm::Sha3_256 => BuiltinHash::Sha3_256(Sha3_256::new()),
            HashAlgorithm::Sha3_384 => BuiltinHash::Sha3_384(Sha3_384::new()),
            HashAlgorithm::Sha3_512 => BuiltinHash::Sha3_512(Sha3_512::new()),
            HashAlgorithm::Any => {
                return Err(CryptoError::invalid_argument(
                    "hash algorithm",
                    "a concrete hash",
                    "Any",
                ))
            }
        })
    }

    fn absorb(&mut self, input: &[u8]) {
        match self {
            BuiltinHash::Sha224(h) => h.update(input),
            BuiltinHash::Sha256(h) => h.update(input),
            BuiltinHash::Sha384(h) => h.update(input),
            BuiltinHash::Sha512(h) => h.update(input),
            BuiltinHash::Sha3_256(h) => h.update(input),
            BuiltinHash::Sha3_384(h) => h.update(input),
            BuiltinHash::Sha3_512(h) => h.update(input),
        }
    }

    fn digest(self) -> Vec<u8> {
        match self {
            BuiltinHash::Sha224(h) => h.finalize().to_vec(),
            BuiltinHash::Sha256(h) => h.finalize().to_vec(),
            BuiltinHash::Sha384(h) => h.finalize().to_vec(),
            BuiltinHash::Sha512(h) => h.finalize().to_vec(),
            BuiltinHash::Sha3_256(h) => h.finalize().to_vec(),
            BuiltinHash::Sha3_384(h) => h.finalize().to_vec(),
            BuiltinHash::Sha3_512(h) => h.finalize().to_vec(),
        }
    }
}

impl HashOp for BuiltinHash {
    fn update(&mut self, input: &[u8]) -> CryptoResult<()> {
        self.absorb(input);
        Ok(())
    }

    fn finish(self: Box<Self>) -> CryptoResult<Vec<u8>> {
        Ok((*self).digest())
    }

    fn box_clone(&self) -> CryptoResult<Box<dyn HashOp>> {
        Ok(Box::new(self.clone()))
    }
}

/// One-shot digest
pub fn compute(alg: HashAlgorithm, input: &[u8]) -> CryptoResult<Vec<u8>> {
    let mut state = BuiltinHash::new(alg)?;
    state.absorb(input);
    Ok(state.digest())
}
