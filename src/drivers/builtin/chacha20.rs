//! ChaCha20 Stream Cipher (RFC 8439)
//!
//! A streaming context: `set_key`, `start(nonce, counter)`, then any number
//! of `update` calls. Keystream left over from a partial block is carried
//! across calls, so the output never depends on how the input is chunked.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, CryptoResult};

/// Size of ChaCha20 key in bytes
pub const CHACHA20_KEY_SIZE: usize = 32;

/// Size of ChaCha20 nonce in bytes
pub const CHACHA20_NONCE_SIZE: usize = 12;

/// Size of ChaCha20 block in bytes
pub const CHACHA20_BLOCK_SIZE: usize = 64;

const COUNTER_WORD: usize = 12;

/// ChaCha20 streaming context
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ChaCha20Context {
    state: [u32; 16],
    keystream: [u8; CHACHA20_BLOCK_SIZE],
    keystream_bytes_remaining: usize,
}

impl Default for ChaCha20Context {
    fn default() -> Self {
        Self::new()
    }
}

impl ChaCha20Context {
    pub fn new() -> Self {
        let mut state = [0u32; 16];
        // Constants "expand 32-byte k"
        state[0] = 0x61707865;
        state[1] = 0x3320646e;
        state[2] = 0x79622d32;
        state[3] = 0x6b206574;
        Self {
            state,
            keystream: [0u8; CHACHA20_BLOCK_SIZE],
            keystream_bytes_remaining: 0,
        }
    }

    /// Load a 256-bit key
    pub fn set_key(&mut self, key: &[u8]) -> CryptoResult<()> {
        if key.len() != CHACHA20_KEY_SIZE {
            return Err(CryptoError::invalid_argument(
                "key",
                &format!("{} bytes", CHACHA20_KEY_SIZE),
                &format!("{} bytes", key.len()),
            ));
        }
        for (i, word) in key.chunks_exact(4).enumerate() {
            self.state[4 + i] = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        }
        Ok(())
    }

    /// Set the nonce and initial block counter, discarding leftover keystream
    pub fn start(&mut self, nonce: &[u8], counter: u32) -> CryptoResult<()> {
        if nonce.len() != CHACHA20_NONCE_SIZE {
            return Err(CryptoError::invalid_argument(
                "nonce",
                &format!("{} bytes", CHACHA20_NONCE_SIZE),
                &format!("{} bytes", nonce.len()),
            ));
        }
        self.state[COUNTER_WORD] = counter;
        for (i, word) in nonce.chunks_exact(4).enumerate() {
            self.state[13 + i] = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        }
        self.keystream.zeroize();
        self.keystream_bytes_remaining = 0;
        Ok(())
    }

    #[inline]
    fn quarter_round(x: &mut [u32; 16], a: usize, b: usize, c: usize, d: usize) {
        x[a] = x[a].wrapping_add(x[b]);
        x[d] = (x[d] ^ x[a]).rotate_left(16);

        x[c] = x[c].wrapping_add(x[d]);
        x[b] = (x[b] ^ x[c]).rotate_left(12);

        x[a] = x[a].wrapping_add(x[b]);
        x[d] = (x[d] ^ x[a]).rotate_left(8);

        x[c] = x[c].wrapping_add(x[d]);
        x[b] = (x[b] ^ x[c]).rotate_left(7);
    }

    /// Produce the next keystream block and advance the counter
    fn next_block(&mut self) {
        let mut x = self.state;
        for _ in 0..10 {
            Self::quarter_round(&mut x, 0, 4, 8, 12);
            Self::quarter_round(&mut x, 1, 5, 9, 13);
            Self::quarter_round(&mut x, 2, 6, 10, 14);
            Self::quarter_round(&mut x, 3, 7, 11, 15);

            Self::quarter_round(&mut x, 0, 5, 10, 15);
            Self::quarter_round(&mut x, 1, 6, 11, 12);
            Self::quarter_round(&mut x, 2, 7, 8, 13);
            Self::quarter_round(&mut x, 3, 4, 9, 14);
        }
        for (i, word) in x.iter().enumerate() {
            let out = word.wrapping_add(self.state[i]);
            self.keystream[i * 4..(i + 1) * 4].copy_from_slice(&out.to_le_bytes());
        }
        x.zeroize();
        self.state[COUNTER_WORD] = self.state[COUNTER_WORD].wrapping_add(1);
    }

    /// XOR `input` with the keystream into `output`
    ///
    /// `output` must be at least as long as `input`. Zero-length input is
    /// accepted and changes nothing.
    pub fn update(&mut self, input: &[u8], output: &mut [u8]) -> CryptoResult<()> {
        if output.len() < input.len() {
            return Err(CryptoError::buffer_too_small(input.len(), output.len()));
        }
        let mut offset = 0;

        // Leftover keystream from the previous call
        while offset < input.len() && self.keystream_bytes_remaining > 0 {
            let pos = CHACHA20_BLOCK_SIZE - self.keystream_bytes_remaining;
            output[offset] = input[offset] ^ self.keystream[pos];
            self.keystream_bytes_remaining -= 1;
            offset += 1;
        }

        // Whole blocks
        while input.len() - offset >= CHACHA20_BLOCK_SIZE {
            self.next_block();
            for i in 0..CHACHA20_BLOCK_SIZE {
                output[offset + i] = input[offset + i] ^ self.keystream[i];
            }
            offset += CHACHA20_BLOCK_SIZE;
        }

        // Trailing partial block; keep the rest of its keystream
        let tail = input.len() - offset;
        if tail > 0 {
            self.next_block();
            for i in 0..tail {
                output[offset + i] = input[offset + i] ^ self.keystream[i];
            }
            self.keystream_bytes_remaining = CHACHA20_BLOCK_SIZE - tail;
        }
        Ok(())
    }
}

/// One-shot ChaCha20
pub fn chacha20_process(key: &[u8], nonce: &[u8], counter: u32, input: &[u8]) -> CryptoResult<Vec<u8>> {
    let mut ctx = ChaCha20Context::new();
    ctx.set_key(key)?;
    ctx.start(nonce, counter)?;
    let mut output = vec![0u8; input.len()];
    ctx.update(input, &mut output)?;
    Ok(output)
}

const SELF_TEST_KEY_1: [u8; 32] = {
    let mut key = [0u8; 32];
    key[31] = 0x01;
    key
};

const SELF_TEST_NONCE_1: [u8; 12] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x02];

const SELF_TEST_PLAINTEXT_1: &[u8] = b"Any submission to the IETF intended by the Contributor for publication as all or part of an IETF Internet-Draft or RFC and any statement made within the context of an IETF activity is considered an \"IETF Contribution\". Such statements include oral statements in IETF sessions, as well as written and electronic communications made at any time or place, which are addressed to";

const SELF_TEST_KEYSTREAM_0: &str = "76b8e0ada0f13d90405d6ae55386bd28bdd219b8a08ded1aa836efcc8b770dc7da41597c5157488d7724e03fb8d84a376a43b8f41518a11cc387b669b2ee6586";

const SELF_TEST_CIPHERTEXT_1: &str = "a3fbf07df3fa2fde4f376ca23e82737041605d9f4f4f57bd8cff2c1d4b7955ec2a97948bd3722915c8f3d337f7d370050e9e96d647b7c39f56e031ca5eb6250d4042e02785ececfa4b4bb5e8ead0440e20b6e8db09d881a7c6132f420e52795042bdfa7773d8a9051447b3291ce1411c680465552aa6c405b7764d5e87bea85ad00f8449ed8f72d0d662ab052691ca66424bc86d2df80ea41f43abf937d3259dc4b2d0dfb48a6c9139ddd7f76966e928e635553ba76c5c879d7b35d49eb2e62b0871cdac638939e25e8a1e0ef9d5280fa8ca328b351c3c765989cbcf3daa8b6ccc3aaf9f3979c92b3720fc88dc95ed84a1be059c6499b9fda236e7e818b04b0bc39c1e876b193bfe5569753f88128cc08aaa9b63d1a16f80ef2554d7189c411f5869ca52c5b83fa36ff216b9c1d30062bebcfd2dc5bce0911934fda79a86f6e698ced759c3ff9b6477338f3da4f9cd8514ea9982ccafb341b2384dd902f3d1ab7ac61dd29c6f21ba5b862f3730e37cfdc4fd806c22f221";

/// Known-answer self test
///
/// Checks the published keystream for an all-zero key and nonce, then
/// the 375-byte RFC 8439 vector, once in a single call and once byte by
/// byte.
pub fn self_test() -> CryptoResult<()> {
    let fail = |what: &str| CryptoError::generic("chacha20 self test", what);
    let decode = |hex_str: &str| hex::decode(hex_str).map_err(|e| fail(&e.to_string()));

    let keystream = chacha20_process(&[0u8; 32], &[0u8; 12], 0, &[0u8; 64])?;
    if keystream != decode(SELF_TEST_KEYSTREAM_0)? {
        return Err(fail("zero-key keystream mismatch"));
    }

    let expected = decode(SELF_TEST_CIPHERTEXT_1)?;
    let whole = chacha20_process(&SELF_TEST_KEY_1, &SELF_TEST_NONCE_1, 1, SELF_TEST_PLAINTEXT_1)?;
    if whole != expected {
        return Err(fail("RFC 8439 ciphertext mismatch"));
    }

    let mut ctx = ChaCha20Context::new();
    ctx.set_key(&SELF_TEST_KEY_1)?;
    ctx.start(&SELF_TEST_NONCE_1, 1)?;
    let mut chunked = vec![0u8; SELF_TEST_PLAINTEXT_1.len()];
    for (i, byte) in SELF_TEST_PLAINTEXT_1.iter().enumerate() {
        ctx.update(std::slice::from_ref(byte), &mut chunked[i..i + 1])?;
    }
    if chunked != expected {
        return Err(fail("byte-wise ciphertext mismatch"));
    }
    Ok(())
}
