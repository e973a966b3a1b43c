//! HMAC over the built-in hashes

use hmac::{Hmac, Mac};
use sha2::{Sha224, Sha256, Sha384, Sha512};
use sha3::{Sha3_256, Sha3_384, Sha3_512};

use crate::algorithm::HashAlgorithm;
use crate::drivers::MacOp;
use crate::error::{CryptoError, CryptoResult};

/// HMAC state, one variant per hash
#[derive(Clone)]
pub enum BuiltinHmac {
    Sha224(Hmac<Sha224>),
    Sha256(Hmac<Sha256>),
    Sha384(Hmac<Sha384>),
    Sha512(Hmac<Sha512>),
    Sha3_256(Hmac<Sha3_256>),
    Sha3_384(Hmac<Sha3_384>),
    Sha3_512(Hmac<Sha3_512>),
}

fn invalid_length(_: hmac::digest::InvalidLength) -> CryptoError {
    CryptoError::invalid_argument("hmac key", "a key of any length", "rejected length")
}

impl BuiltinHmac {
    pub fn new(alg: HashAlgorithm, key: &[u8]) -> CryptoResult<Self> {
        Ok(match alg {
            HashAlgorithm::Sha224 => BuiltinHmac::Sha224(Hmac::new_from_slice(key).map_err(invalid_length)?),
            HashAlgorithm::Sha256 => BuiltinHmac::Sha256(Hmac::new_from_slice(key).map_err(invalid_length)?),
            HashAlgorithm::Sha384 => BuiltinHmac::Sha384(Hmac::new_from_slice(key).map_err(invalid_length)?),
            HashAlgorithm::Sha512 => BuiltinHmac::Sha512(Hmac::new_from_slice(key).map_err(invalid_length)?),
            HashAlgorithm::Sha3_256 => BuiltinHmac::Sha3_256(Hmac::new_from_slice(key).map_err(invalid_length)?),
            HashAlgorithm::Sha3_384 => BuiltinHmac::Sha3_384(Hmac::new_from_slice(key).map_err(invalid_length)?),
            HashAlgorithm::Sha3_512 => BuiltinHmac::Sha3_512(Hmac::new_from_slice(key).map_err(invalid_length)?),
            HashAlgorithm::Any => {
                return Err(CryptoError::invalid_argument(
                    "hash algorithm",
                    "a concrete hash",
                    "Any",
                ))
            }
        })
    }

    pub fn absorb(&mut self, input: &[u8]) {
        match self {
            BuiltinHmac::Sha224(m) => m.update(input),
            BuiltinHmac::Sha256(m) => m.update(input),
            BuiltinHmac::Sha384(m) => m.update(input),
            BuiltinHmac::Sha512(m) => m.update(input),
            BuiltinHmac::Sha3_256(m) => m.update(input),
            BuiltinHmac::Sha3_384(m) => m.update(input),
            BuiltinHmac::Sha3_512(m) => m.update(input),
        }
    }

    pub fn tag(self) -> Vec<u8> {
        match self {
            BuiltinHmac::Sha224(m) => m.finalize().into_bytes().to_vec(),
            BuiltinHmac::Sha256(m) => m.finalize().into_bytes().to_vec(),
            BuiltinHmac::Sha384(m) => m.finalize().into_bytes().to_vec(),
            BuiltinHmac::Sha512(m) => m.finalize().into_bytes().to_vec(),
            BuiltinHmac::Sha3_256(m) => m.finalize().into_bytes().to_vec(),
            BuiltinHmac::Sha3_384(m) => m.finalize().into_bytes().to_vec(),
            BuiltinHmac::Sha3_512(m) => m.finalize().into_bytes().to_vec(),
        }
    }
}

impl MacOp for BuiltinHmac {
    fn update(&mut self, input: &[u8]) -> CryptoResult<()> {
        self.absorb(input);
        Ok(())
    }

    fn finish(self: Box<Self>) -> CryptoResult<Vec<u8>> {
        Ok((*self).tag())
    }

    fn box_clone(&self) -> CryptoResult<Box<dyn MacOp>> {
        Ok(Box::new(self.clone()))
    }
}

/// One-shot HMAC, used by the key derivation functions
pub fn hmac(alg: HashAlgorithm, key: &[u8], parts: &[&[u8]]) -> CryptoResult<Vec<u8>> {
    let mut mac = BuiltinHmac::new(alg, key)?;
    for part in parts {
        mac.absorb(part);
    }
    Ok(mac.tag())
}
