//! Key derivation: HKDF, TLS-1.2 PRF and PBKDF2-HMAC
//!
//! Inputs are collected step by step; output is produced block by block
//! on demand so a derivation can be read in arbitrary chunks.

use super::hash::with_hash;
use super::mac::hmac;
use crate::algorithm::{Algorithm, HashAlgorithm};
use crate::drivers::{DerivationStep, KdfOp};
use crate::error::{CryptoError, CryptoResult};
use crate::secure_memory::SecureBytes;

/// Largest PBKDF2 iteration count accepted
pub const PBKDF2_MAX_COST: u64 = u32::MAX as u64;

#[derive(Clone)]
enum Inputs {
    Hkdf {
        salt: Option<SecureBytes>,
        prk: Option<SecureBytes>,
        info: Option<Vec<u8>>,
    },
    HkdfExtract {
        salt: Option<SecureBytes>,
        prk: Option<SecureBytes>,
    },
    HkdfExpand {
        prk: Option<SecureBytes>,
        info: Option<Vec<u8>>,
    },
    Tls12Prf {
        seed: Option<Vec<u8>>,
        secret: Option<SecureBytes>,
        label: Option<Vec<u8>>,
    },
    Pbkdf2 {
        cost: Option<u32>,
        salt: Option<Vec<u8>>,
        password: Option<SecureBytes>,
    },
}

/// Derivation state of the built-in driver
#[derive(Clone)]
pub struct BuiltinKdf {
    alg: Algorithm,
    hash: HashAlgorithm,
    inputs: Inputs,
    /// Current output block and how much of it has been handed out
    block: SecureBytes,
    used: usize,
    counter: u32,
    /// TLS PRF chaining value A(i)
    chain: SecureBytes,
    started: bool,
}

fn out_of_order(step: DerivationStep) -> CryptoError {
    CryptoError::bad_state("key derivation input", &format!("{:?} is out of order or repeated", step))
}

fn wrong_step(alg: Algorithm, step: DerivationStep) -> CryptoError {
    CryptoError::invalid_argument("derivation step", &format!("a step used by {}", alg), &format!("{:?}", step))
}

fn hkdf_extract(hash: HashAlgorithm, salt: Option<&SecureBytes>, secret: &[u8]) -> CryptoResult<SecureBytes> {
    let salt = salt.map(|s| s.as_bytes());
    let prk = with_hash!(hash, |D| Ok(hkdf::Hkdf::<D>::extract(salt, secret).0.to_vec()))?;
    Ok(SecureBytes::from(prk))
}

impl BuiltinKdf {
    pub fn new(alg: Algorithm) -> CryptoResult<Self> {
        let (hash, inputs) = match alg {
            Algorithm::Hkdf(h) => (
                h,
                Inputs::Hkdf {
                    salt: None,
                    prk: None,
                    info: None,
                },
            ),
            Algorithm::HkdfExtract(h) => (h, Inputs::HkdfExtract { salt: None, prk: None }),
            Algorithm::HkdfExpand(h) => (h, Inputs::HkdfExpand { prk: None, info: None }),
            Algorithm::Tls12Prf(h) => (
                h,
                Inputs::Tls12Prf {
                    seed: None,
                    secret: None,
                    label: None,
                },
            ),
            Algorithm::Pbkdf2Hmac(h) => (
                h,
                Inputs::Pbkdf2 {
                    cost: None,
                    salt: None,
                    password: None,
                },
            ),
            other => return Err(CryptoError::not_supported(format!("{} as a key derivation", other))),
        };
        if hash == HashAlgorithm::Any {
            return Err(CryptoError::invalid_argument("hash algorithm", "a concrete hash", "Any"));
        }
        Ok(Self {
            alg,
            hash,
            inputs,
            block: SecureBytes::new(&[]),
            used: 0,
            counter: 0,
            chain: SecureBytes::new(&[]),
            started: false,
        })
    }

    fn next_block(&mut self) -> CryptoResult<()> {
        self.counter = self
            .counter
            .checked_add(1)
            .ok_or_else(|| CryptoError::InsufficientData {
                requested: 1,
                remaining: 0,
            })?;
        let block = match &self.inputs {
            Inputs::Hkdf { prk: Some(prk), info: Some(info), .. }
            | Inputs::HkdfExpand { prk: Some(prk), info: Some(info) } => {
                if self.counter > 255 {
                    return Err(CryptoError::InsufficientData {
                        requested: 1,
                        remaining: 0,
                    });
                }
                let counter = [self.counter as u8];
                hmac(self.hash, prk.as_bytes(), &[self.block.as_bytes(), info.as_slice(), &counter[..]])?
            }
            Inputs::HkdfExtract { prk: Some(prk), .. } => {
                if self.counter > 1 {
                    return Err(CryptoError::InsufficientData {
                        requested: 1,
                        remaining: 0,
                    });
                }
                prk.as_bytes().to_vec()
            }
            Inputs::Tls12Prf {
                seed: Some(seed),
                secret: Some(secret),
                label: Some(label),
            } => {
                // A(i) = HMAC(secret, A(i-1)), A(0) = label || seed
                let a = if self.counter == 1 {
                    hmac(self.hash, secret.as_bytes(), &[label.as_slice(), seed.as_slice()])?
                } else {
                    hmac(self.hash, secret.as_bytes(), &[self.chain.as_bytes()])?
                };
                let block = hmac(self.hash, secret.as_bytes(), &[a.as_slice(), label.as_slice(), seed.as_slice()])?;
                self.chain = SecureBytes::from(a);
                block
            }
            Inputs::Pbkdf2 {
                cost: Some(cost),
                salt: Some(salt),
                password: Some(password),
            } => {
                let mut u = hmac(self.hash, password.as_bytes(), &[salt.as_slice(), &self.counter.to_be_bytes()[..]])?;
                let mut block = u.clone();
                for _ in 1..*cost {
                    u = hmac(self.hash, password.as_bytes(), &[u.as_slice()])?;
                    block.iter_mut().zip(u.iter()).for_each(|(b, x)| *b ^= x);
                }
                block
            }
            _ => {
                return Err(CryptoError::bad_state(
                    "key derivation output",
                    "required inputs are missing",
                ))
            }
        };
        self.block = SecureBytes::from(block);
        self.used = 0;
        Ok(())
    }
}

impl KdfOp for BuiltinKdf {
    fn input_bytes(&mut self, step: DerivationStep, data: &[u8]) -> CryptoResult<()> {
        if self.started {
            return Err(CryptoError::bad_state("key derivation input", "output has already been read"));
        }
        let alg = self.alg;
        let hash = self.hash;
        match (&mut self.inputs, step) {
            (Inputs::Hkdf { salt, prk, .. }, DerivationStep::Salt)
            | (Inputs::HkdfExtract { salt, prk }, DerivationStep::Salt) => {
                if salt.is_some() || prk.is_some() {
                    return Err(out_of_order(step));
                }
                *salt = Some(SecureBytes::new(data));
            }
            (Inputs::Hkdf { salt, prk, .. }, DerivationStep::Secret)
            | (Inputs::HkdfExtract { salt, prk }, DerivationStep::Secret) => {
                if prk.is_some() {
                    return Err(out_of_order(step));
                }
                *prk = Some(hkdf_extract(hash, salt.as_ref(), data)?);
            }
            (Inputs::Hkdf { info, .. }, DerivationStep::Info) => {
                if info.is_some() {
                    return Err(out_of_order(step));
                }
                *info = Some(data.to_vec());
            }
            (Inputs::HkdfExpand { prk, .. }, DerivationStep::Secret) => {
                if prk.is_some() {
                    return Err(out_of_order(step));
                }
                if data.len() < hash.output_size() {
                    return Err(CryptoError::invalid_argument(
                        "pseudorandom key",
                        &format!("at least {} bytes", hash.output_size()),
                        &format!("{} bytes", data.len()),
                    ));
                }
                *prk = Some(SecureBytes::new(data));
            }
            (Inputs::HkdfExpand { prk, info }, DerivationStep::Info) => {
                if prk.is_none() || info.is_some() {
                    return Err(out_of_order(step));
                }
                *info = Some(data.to_vec());
            }
            (Inputs::Tls12Prf { seed, .. }, DerivationStep::Seed) => {
                if seed.is_some() {
                    return Err(out_of_order(step));
                }
                *seed = Some(data.to_vec());
            }
            (Inputs::Tls12Prf { seed, secret, .. }, DerivationStep::Secret) => {
                if seed.is_none() || secret.is_some() {
                    return Err(out_of_order(step));
                }
                *secret = Some(SecureBytes::new(data));
            }
            (Inputs::Tls12Prf { secret, label, .. }, DerivationStep::Label) => {
                if secret.is_none() || label.is_some() {
                    return Err(out_of_order(step));
                }
                *label = Some(data.to_vec());
            }
            (Inputs::Pbkdf2 { cost, salt, password }, DerivationStep::Salt) => {
                if cost.is_none() || password.is_some() {
                    return Err(out_of_order(step));
                }
                // Several salt inputs are concatenated
                salt.get_or_insert_with(Vec::new).extend_from_slice(data);
            }
            (Inputs::Pbkdf2 { salt, password, .. }, DerivationStep::Password) => {
                if salt.is_none() || password.is_some() {
                    return Err(out_of_order(step));
                }
                *password = Some(SecureBytes::new(data));
            }
            (_, step) => return Err(wrong_step(alg, step)),
        }
        Ok(())
    }

    fn input_integer(&mut self, step: DerivationStep, value: u64) -> CryptoResult<()> {
        if self.started {
            return Err(CryptoError::bad_state("key derivation input", "output has already been read"));
        }
        match (&mut self.inputs, step) {
            (Inputs::Pbkdf2 { cost, .. }, DerivationStep::Cost) => {
                if cost.is_some() {
                    return Err(out_of_order(step));
                }
                if value == 0 {
                    return Err(CryptoError::invalid_argument("cost", "at least 1", "0"));
                }
                if value > PBKDF2_MAX_COST {
                    return Err(CryptoError::not_supported(format!("PBKDF2 cost {}", value)));
                }
                *cost = Some(value as u32);
                Ok(())
            }
            (_, step) => Err(wrong_step(self.alg, step)),
        }
    }

    fn ready(&self) -> bool {
        match &self.inputs {
            Inputs::Hkdf { prk, info, .. } | Inputs::HkdfExpand { prk, info } => prk.is_some() && info.is_some(),
            Inputs::HkdfExtract { prk, .. } => prk.is_some(),
            Inputs::Tls12Prf { label, .. } => label.is_some(),
            Inputs::Pbkdf2 { password, .. } => password.is_some(),
        }
    }

    fn max_capacity(&self) -> usize {
        let hash_len = self.hash.output_size();
        match self.inputs {
            Inputs::Hkdf { .. } | Inputs::HkdfExpand { .. } => 255 * hash_len,
            Inputs::HkdfExtract { .. } => hash_len,
            Inputs::Tls12Prf { .. } => usize::MAX,
            Inputs::Pbkdf2 { .. } => (u32::MAX as usize).saturating_mul(hash_len),
        }
    }

    fn output(&mut self, out: &mut [u8]) -> CryptoResult<()> {
        if !self.ready() {
            return Err(CryptoError::bad_state("key derivation output", "required inputs are missing"));
        }
        self.started = true;
        let mut written = 0;
        while written < out.len() {
            if self.used == self.block.len() {
                self.next_block()?;
            }
            let take = (self.block.len() - self.used).min(out.len() - written);
            out[written..written + take].copy_from_slice(&self.block.as_bytes()[self.used..self.used + take]);
            self.used += take;
            written += take;
        }
        Ok(())
    }

    fn box_clone(&self) -> CryptoResult<Box<dyn KdfOp>> {
        Ok(Box::new(self.clone()))
    }
}
