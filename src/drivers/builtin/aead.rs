//! AES-GCM and ChaCha20-Poly1305

use aes::Aes192;
use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm};
use chacha20poly1305::ChaCha20Poly1305;

use crate::algorithm::{Algorithm, AEAD_TAG_SIZE};
use crate::drivers::{AeadOp, CipherDirection};
use crate::error::{CryptoError, CryptoResult};
use crate::secure_memory::SecureBytes;

type Aes192Gcm = AesGcm<Aes192, U12>;

const NONCE_SIZE: usize = 12;

fn seal(alg: Algorithm, key: &[u8], nonce: &[u8], payload: Payload<'_, '_>) -> CryptoResult<Vec<u8>> {
    let nonce = aes_gcm::Nonce::from_slice(nonce);
    let key_err = || CryptoError::invalid_argument("aead key", "a valid key length", &format!("{} bytes", key.len()));
    let res = match (alg, key.len()) {
        (Algorithm::Gcm, 16) => Aes128Gcm::new_from_slice(key).map_err(|_| key_err())?.encrypt(nonce, payload),
        (Algorithm::Gcm, 24) => Aes192Gcm::new_from_slice(key).map_err(|_| key_err())?.encrypt(nonce, payload),
        (Algorithm::Gcm, 32) => Aes256Gcm::new_from_slice(key).map_err(|_| key_err())?.encrypt(nonce, payload),
        (Algorithm::ChaCha20Poly1305, 32) => ChaCha20Poly1305::new_from_slice(key)
            .map_err(|_| key_err())?
            .encrypt(nonce, payload),
        _ => return Err(key_err()),
    };
    res.map_err(|_| CryptoError::generic("aead encrypt", "primitive failure"))
}

fn open(alg: Algorithm, key: &[u8], nonce: &[u8], payload: Payload<'_, '_>) -> CryptoResult<Vec<u8>> {
    let nonce = aes_gcm::Nonce::from_slice(nonce);
    let key_err = || CryptoError::invalid_argument("aead key", "a valid key length", &format!("{} bytes", key.len()));
    let res = match (alg, key.len()) {
        (Algorithm::Gcm, 16) => Aes128Gcm::new_from_slice(key).map_err(|_| key_err())?.decrypt(nonce, payload),
        (Algorithm::Gcm, 24) => Aes192Gcm::new_from_slice(key).map_err(|_| key_err())?.decrypt(nonce, payload),
        (Algorithm::Gcm, 32) => Aes256Gcm::new_from_slice(key).map_err(|_| key_err())?.decrypt(nonce, payload),
        (Algorithm::ChaCha20Poly1305, 32) => ChaCha20Poly1305::new_from_slice(key)
            .map_err(|_| key_err())?
            .decrypt(nonce, payload),
        _ => return Err(key_err()),
    };
    res.map_err(|_| CryptoError::InvalidSignature {
        operation: format!("{} tag verification", alg),
    })
}

/// AEAD state of the built-in driver
///
/// The primitives are one-shot, so additional data and input are buffered
/// until the operation completes.
#[derive(Clone)]
pub struct BuiltinAead {
    alg: Algorithm,
    direction: CipherDirection,
    key: SecureBytes,
    nonce: Option<[u8; NONCE_SIZE]>,
    ad: Vec<u8>,
    input: SecureBytes,
    input_started: bool,
}

impl BuiltinAead {
    pub fn new(alg: Algorithm, direction: CipherDirection, key: &[u8]) -> CryptoResult<Self> {
        match (alg, key.len()) {
            (Algorithm::Gcm, 16 | 24 | 32) | (Algorithm::ChaCha20Poly1305, 32) => {}
            (Algorithm::Gcm | Algorithm::ChaCha20Poly1305, len) => {
                return Err(CryptoError::invalid_argument(
                    "aead key",
                    "a valid key length",
                    &format!("{} bytes", len),
                ))
            }
            (other, _) => return Err(CryptoError::not_supported(format!("{} as an AEAD", other))),
        }
        Ok(Self {
            alg,
            direction,
            key: SecureBytes::new(key),
            nonce: None,
            ad: Vec::new(),
            input: SecureBytes::new(&[]),
            input_started: false,
        })
    }

    fn nonce(&self, operation: &str) -> CryptoResult<[u8; NONCE_SIZE]> {
        self.nonce
            .ok_or_else(|| CryptoError::bad_state(operation, "no nonce has been set"))
    }
}

impl AeadOp for BuiltinAead {
    fn set_nonce(&mut self, nonce: &[u8]) -> CryptoResult<()> {
        if self.nonce.is_some() {
            return Err(CryptoError::bad_state("set_nonce", "a nonce is already set"));
        }
        if nonce.len() != NONCE_SIZE {
            return Err(CryptoError::invalid_argument(
                "nonce",
                "12 bytes",
                &format!("{} bytes", nonce.len()),
            ));
        }
        let mut fixed = [0u8; NONCE_SIZE];
        fixed.copy_from_slice(nonce);
        self.nonce = Some(fixed);
        Ok(())
    }

    fn update_ad(&mut self, ad: &[u8]) -> CryptoResult<()> {
        self.nonce("update_ad")?;
        if self.input_started {
            return Err(CryptoError::bad_state("update_ad", "input has already been supplied"));
        }
        self.ad.extend_from_slice(ad);
        Ok(())
    }

    fn update(&mut self, input: &[u8]) -> CryptoResult<()> {
        self.nonce("update")?;
        self.input_started = true;
        self.input.extend_from_slice(input);
        Ok(())
    }

    fn input_len(&self) -> usize {
        self.input.len()
    }

    fn finish(self: Box<Self>) -> CryptoResult<(Vec<u8>, Vec<u8>)> {
        if self.direction != CipherDirection::Encrypt {
            return Err(CryptoError::bad_state("aead finish", "the operation decrypts"));
        }
        let nonce = self.nonce("aead finish")?;
        let mut sealed = seal(
            self.alg,
            self.key.as_bytes(),
            &nonce,
            Payload {
                msg: self.input.as_bytes(),
                aad: &self.ad,
            },
        )?;
        let tag = sealed.split_off(sealed.len() - AEAD_TAG_SIZE);
        Ok((sealed, tag))
    }

    fn verify(self: Box<Self>, tag: &[u8]) -> CryptoResult<SecureBytes> {
        if self.direction != CipherDirection::Decrypt {
            return Err(CryptoError::bad_state("aead verify", "the operation encrypts"));
        }
        if tag.len() != AEAD_TAG_SIZE {
            return Err(CryptoError::InvalidSignature {
                operation: format!("{} tag of {} bytes", self.alg, tag.len()),
            });
        }
        let nonce = self.nonce("aead verify")?;
        let mut sealed = SecureBytes::with_capacity(self.input.len() + AEAD_TAG_SIZE);
        sealed.extend_from_slice(self.input.as_bytes());
        sealed.extend_from_slice(tag);
        let plaintext = open(
            self.alg,
            self.key.as_bytes(),
            &nonce,
            Payload {
                msg: sealed.as_bytes(),
                aad: &self.ad,
            },
        )?;
        Ok(SecureBytes::from(plaintext))
    }

    fn box_clone(&self) -> CryptoResult<Box<dyn AeadOp>> {
        Ok(Box::new(self.clone()))
    }
}
