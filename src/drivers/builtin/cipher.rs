//! Unauthenticated ciphers: AES-CTR, AES-ECB, AES-CBC and ChaCha20

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit, KeyIvInit, StreamCipher};
use aes::{Aes128, Aes192, Aes256};
use ctr::Ctr128BE;

use super::chacha20::ChaCha20Context;
use crate::algorithm::Algorithm;
use crate::drivers::{CipherDirection, CipherOp};
use crate::error::{CryptoError, CryptoResult};
use crate::secure_memory::SecureBytes;

const AES_BLOCK_SIZE: usize = 16;

/// AES block cipher keyed for one of the three key sizes
#[derive(Clone)]
pub enum AesBlock {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

fn bad_key_length(len: usize) -> CryptoError {
    CryptoError::invalid_argument("aes key", "16, 24 or 32 bytes", &format!("{} bytes", len))
}

impl AesBlock {
    pub fn new(key: &[u8]) -> CryptoResult<Self> {
        let err = |_| bad_key_length(key.len());
        Ok(match key.len() {
            16 => AesBlock::Aes128(Aes128::new_from_slice(key).map_err(err)?),
            24 => AesBlock::Aes192(Aes192::new_from_slice(key).map_err(err)?),
            32 => AesBlock::Aes256(Aes256::new_from_slice(key).map_err(err)?),
            other => return Err(bad_key_length(other)),
        })
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            AesBlock::Aes128(c) => c.encrypt_block(block),
            AesBlock::Aes192(c) => c.encrypt_block(block),
            AesBlock::Aes256(c) => c.encrypt_block(block),
        }
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            AesBlock::Aes128(c) => c.decrypt_block(block),
            AesBlock::Aes192(c) => c.decrypt_block(block),
            AesBlock::Aes256(c) => c.decrypt_block(block),
        }
    }
}

#[derive(Clone)]
enum AesCtr {
    Aes128(Ctr128BE<Aes128>),
    Aes192(Ctr128BE<Aes192>),
    Aes256(Ctr128BE<Aes256>),
}

impl AesCtr {
    fn new(key: &[u8], iv: &[u8]) -> CryptoResult<Self> {
        if iv.len() != AES_BLOCK_SIZE {
            return Err(CryptoError::invalid_argument(
                "iv",
                "16 bytes",
                &format!("{} bytes", iv.len()),
            ));
        }
        let err = |_| bad_key_length(key.len());
        Ok(match key.len() {
            16 => AesCtr::Aes128(Ctr128BE::new_from_slices(key, iv).map_err(err)?),
            24 => AesCtr::Aes192(Ctr128BE::new_from_slices(key, iv).map_err(err)?),
            32 => AesCtr::Aes256(Ctr128BE::new_from_slices(key, iv).map_err(err)?),
            other => return Err(bad_key_length(other)),
        })
    }

    fn apply(&mut self, input: &[u8], output: &mut [u8]) -> CryptoResult<()> {
        let output = &mut output[..input.len()];
        let res = match self {
            AesCtr::Aes128(c) => c.apply_keystream_b2b(input, output),
            AesCtr::Aes192(c) => c.apply_keystream_b2b(input, output),
            AesCtr::Aes256(c) => c.apply_keystream_b2b(input, output),
        };
        res.map_err(|e| CryptoError::generic("aes-ctr", e))
    }
}

#[derive(Clone)]
enum Mode {
    /// Waiting for an IV
    Pending,
    Ctr(AesCtr),
    Block {
        cipher: AesBlock,
        /// CBC chaining value; unused for ECB
        chain: [u8; AES_BLOCK_SIZE],
        buffer: SecureBytes,
    },
    ChaCha20(ChaCha20Context),
}

/// Cipher state of the built-in driver
#[derive(Clone)]
pub struct BuiltinCipher {
    alg: Algorithm,
    direction: CipherDirection,
    key: SecureBytes,
    mode: Mode,
}

impl BuiltinCipher {
    pub fn new(alg: Algorithm, direction: CipherDirection, key: &[u8]) -> CryptoResult<Self> {
        let mode = match alg {
            Algorithm::Ctr | Algorithm::CbcNoPadding | Algorithm::CbcPkcs7 => {
                AesBlock::new(key)?;
                Mode::Pending
            }
            Algorithm::EcbNoPadding => Mode::Block {
                cipher: AesBlock::new(key)?,
                chain: [0u8; AES_BLOCK_SIZE],
                buffer: SecureBytes::with_capacity(AES_BLOCK_SIZE * 2),
            },
            Algorithm::StreamCipher => {
                let mut ctx = ChaCha20Context::new();
                ctx.set_key(key)?;
                Mode::Pending
            }
            other => return Err(CryptoError::not_supported(format!("{} as a cipher", other))),
        };
        Ok(Self {
            alg,
            direction,
            key: SecureBytes::new(key),
            mode,
        })
    }

    fn is_cbc(&self) -> bool {
        matches!(self.alg, Algorithm::CbcNoPadding | Algorithm::CbcPkcs7)
    }

    /// Whether decryption holds back the last full block for unpadding
    fn holds_back_block(&self) -> bool {
        self.alg == Algorithm::CbcPkcs7 && self.direction == CipherDirection::Decrypt
    }

    fn buffered(&self) -> usize {
        match &self.mode {
            Mode::Block { buffer, .. } => buffer.len(),
            _ => 0,
        }
    }

    fn process_block(&self, cipher: &AesBlock, chain: &mut [u8; AES_BLOCK_SIZE], block: &mut [u8]) {
        let cbc = self.is_cbc();
        match self.direction {
            CipherDirection::Encrypt => {
                if cbc {
                    block.iter_mut().zip(chain.iter()).for_each(|(b, c)| *b ^= c);
                }
                cipher.encrypt_block(block);
                if cbc {
                    chain.copy_from_slice(block);
                }
            }
            CipherDirection::Decrypt => {
                let mut saved = [0u8; AES_BLOCK_SIZE];
                saved.copy_from_slice(block);
                cipher.decrypt_block(block);
                if cbc {
                    block.iter_mut().zip(chain.iter()).for_each(|(b, c)| *b ^= c);
                    *chain = saved;
                }
            }
        }
    }
}

impl CipherOp for BuiltinCipher {
    fn set_iv(&mut self, iv: &[u8]) -> CryptoResult<()> {
        if !matches!(self.mode, Mode::Pending) {
            return Err(CryptoError::bad_state("set_iv", "an IV is already set or not used"));
        }
        self.mode = match self.alg {
            Algorithm::Ctr => Mode::Ctr(AesCtr::new(self.key.as_bytes(), iv)?),
            Algorithm::CbcNoPadding | Algorithm::CbcPkcs7 => {
                if iv.len() != AES_BLOCK_SIZE {
                    return Err(CryptoError::invalid_argument(
                        "iv",
                        "16 bytes",
                        &format!("{} bytes", iv.len()),
                    ));
                }
                let mut chain = [0u8; AES_BLOCK_SIZE];
                chain.copy_from_slice(iv);
                Mode::Block {
                    cipher: AesBlock::new(self.key.as_bytes())?,
                    chain,
                    buffer: SecureBytes::with_capacity(AES_BLOCK_SIZE * 2),
                }
            }
            Algorithm::StreamCipher => {
                // 12-byte nonce with counter 0, or 4-byte LE counter + nonce
                let (counter, nonce) = match iv.len() {
                    12 => (0u32, iv),
                    16 => (u32::from_le_bytes([iv[0], iv[1], iv[2], iv[3]]), &iv[4..]),
                    other => {
                        return Err(CryptoError::invalid_argument(
                            "iv",
                            "12 or 16 bytes",
                            &format!("{} bytes", other),
                        ))
                    }
                };
                let mut ctx = ChaCha20Context::new();
                ctx.set_key(self.key.as_bytes())?;
                ctx.start(nonce, counter)?;
                Mode::ChaCha20(ctx)
            }
            _ => return Err(CryptoError::bad_state("set_iv", "the algorithm takes no IV")),
        };
        Ok(())
    }

    fn update_output_size(&self, input_len: usize) -> usize {
        match &self.mode {
            Mode::Block { .. } => {
                let total = self.buffered() + input_len;
                let mut whole = total / AES_BLOCK_SIZE * AES_BLOCK_SIZE;
                if self.holds_back_block() && whole == total && whole > 0 {
                    whole -= AES_BLOCK_SIZE;
                }
                whole
            }
            _ => input_len,
        }
    }

    fn update(&mut self, input: &[u8], output: &mut [u8]) -> CryptoResult<usize> {
        let produced = self.update_output_size(input.len());
        if output.len() < produced {
            return Err(CryptoError::buffer_too_small(produced, output.len()));
        }
        let mut mode = std::mem::replace(&mut self.mode, Mode::Pending);
        let result = match &mut mode {
            Mode::Pending => Err(CryptoError::bad_state("cipher update", "no IV has been set")),
            Mode::Ctr(ctr) => ctr.apply(input, output).map(|_| input.len()),
            Mode::ChaCha20(ctx) => ctx.update(input, output).map(|_| input.len()),
            Mode::Block {
                cipher,
                chain,
                buffer,
            } => {
                buffer.extend_from_slice(input);
                for block_start in (0..produced).step_by(AES_BLOCK_SIZE) {
                    let block = &mut output[block_start..block_start + AES_BLOCK_SIZE];
                    block.copy_from_slice(&buffer.as_bytes()[block_start..block_start + AES_BLOCK_SIZE]);
                    self.process_block(cipher, chain, block);
                }
                buffer.drain_front(produced);
                Ok(produced)
            }
        };
        self.mode = mode;
        result
    }

    fn finish_output_size(&self) -> usize {
        if self.alg == Algorithm::CbcPkcs7 {
            AES_BLOCK_SIZE
        } else {
            0
        }
    }

    fn finish(self: Box<Self>, output: &mut [u8]) -> CryptoResult<usize> {
        let (cipher, mut chain, buffer) = match &self.mode {
            Mode::Pending => return Err(CryptoError::bad_state("cipher finish", "no IV has been set")),
            Mode::Ctr(_) | Mode::ChaCha20(_) => return Ok(0),
            Mode::Block {
                cipher,
                chain,
                buffer,
            } => (cipher, *chain, buffer),
        };

        if self.alg != Algorithm::CbcPkcs7 {
            if !buffer.is_empty() {
                return Err(CryptoError::invalid_argument(
                    "input length",
                    "a multiple of the 16-byte block size",
                    &format!("{} trailing bytes", buffer.len()),
                ));
            }
            return Ok(0);
        }

        let mut block = [0u8; AES_BLOCK_SIZE];
        match self.direction {
            CipherDirection::Encrypt => {
                let pad = (AES_BLOCK_SIZE - buffer.len()) as u8;
                block[..buffer.len()].copy_from_slice(buffer.as_bytes());
                block[buffer.len()..].iter_mut().for_each(|b| *b = pad);
                self.process_block(cipher, &mut chain, &mut block);
                output[..AES_BLOCK_SIZE].copy_from_slice(&block);
                Ok(AES_BLOCK_SIZE)
            }
            CipherDirection::Decrypt => {
                if buffer.len() != AES_BLOCK_SIZE {
                    return Err(CryptoError::invalid_argument(
                        "input length",
                        "a multiple of the 16-byte block size",
                        &format!("{} trailing bytes", buffer.len()),
                    ));
                }
                block.copy_from_slice(buffer.as_bytes());
                self.process_block(cipher, &mut chain, &mut block);
                let pad = block[AES_BLOCK_SIZE - 1] as usize;
                let valid = (1..=AES_BLOCK_SIZE).contains(&pad)
                    && block[AES_BLOCK_SIZE - pad..].iter().all(|b| *b as usize == pad);
                if !valid {
                    crate::utils::secure_zero(&mut block);
                    return Err(CryptoError::InvalidPadding {
                        operation: "cbc pkcs7 decrypt".to_string(),
                    });
                }
                let len = AES_BLOCK_SIZE - pad;
                output[..len].copy_from_slice(&block[..len]);
                crate::utils::secure_zero(&mut block);
                Ok(len)
            }
        }
    }

    fn box_clone(&self) -> CryptoResult<Box<dyn CipherOp>> {
        Ok(Box::new(self.clone()))
    }
}
