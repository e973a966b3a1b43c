//! Utility functions shared across the crypto core

use crate::error::{CryptoError, CryptoResult};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// Constant-time comparison of two byte slices to avoid timing attacks
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Securely zero out sensitive data from memory
pub fn secure_zero(data: &mut [u8]) {
    data.zeroize();
}

/// Copy `src` to the start of `dst`, returning the number of bytes written
///
/// Fails with `BufferTooSmall` before writing anything when `dst` cannot
/// hold all of `src`.
pub fn copy_to_output(src: &[u8], dst: &mut [u8]) -> CryptoResult<usize> {
    if dst.len() < src.len() {
        return Err(CryptoError::buffer_too_small(src.len(), dst.len()));
    }
    dst[..src.len()].copy_from_slice(src);
    Ok(src.len())
}

/// Ensure an output buffer can hold `required` bytes
pub fn check_output(required: usize, dst: &[u8]) -> CryptoResult<()> {
    if dst.len() < required {
        return Err(CryptoError::buffer_too_small(required, dst.len()));
    }
    Ok(())
}
