//! Secure Memory Handling for Key Material
//!
//! Raw key bytes owned by a key slot, buffered plaintext held by multi-part
//! operations and intermediate secrets of key derivations are kept in
//! [`SecureBytes`], which wipes its contents when dropped and never prints
//! them through `Debug`.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A zeroizing container for sensitive byte data such as key material.
///
/// # Security Properties
///
/// 1. Automatically zeroes memory when dropped
/// 2. Prevents contents from being inadvertently logged or displayed
/// 3. Clones are independent copies that are wiped independently
///
/// # Example
///
/// ```
/// use qasa_psa::secure_memory::SecureBytes;
///
/// let key = SecureBytes::new(&[0x01, 0x02, 0x03, 0x04]);
/// assert_eq!(key.len(), 4);
/// assert_eq!(format!("{:?}", key), "SecureBytes([REDACTED; 4 bytes])");
/// ```
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct SecureBytes {
    bytes: Vec<u8>,
}

impl SecureBytes {
    /// Create a new SecureBytes holding a copy of `data`
    pub fn new(data: &[u8]) -> Self {
        Self {
            bytes: data.to_vec(),
        }
    }

    /// Create an empty buffer with pre-allocated capacity
    ///
    /// Pre-allocating avoids reallocations that would leave unwiped copies
    /// of the data behind in freed memory.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    /// Create a zero-filled buffer of `len` bytes
    pub fn zeroed(len: usize) -> Self {
        Self {
            bytes: vec![0u8; len],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Append data to the end of the buffer
    ///
    /// If the append would reallocate, the old allocation is wiped first.
    pub fn extend_from_slice(&mut self, data: &[u8]) {
        if self.bytes.len() + data.len() > self.bytes.capacity() {
            let mut grown = Vec::with_capacity((self.bytes.len() + data.len()).max(32) * 2);
            grown.extend_from_slice(&self.bytes);
            self.bytes.zeroize();
            self.bytes = grown;
        }
        self.bytes.extend_from_slice(data);
    }

    /// Remove the first `n` bytes, wiping them
    pub fn drain_front(&mut self, n: usize) {
        let n = n.min(self.bytes.len());
        self.bytes[..n].zeroize();
        self.bytes.drain(..n);
    }

    /// Clear the buffer, securely zeroing all data
    pub fn clear(&mut self) {
        self.bytes.zeroize();
        self.bytes.clear();
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<Vec<u8>> for SecureBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl AsRef<[u8]> for SecureBytes {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for SecureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureBytes([REDACTED; {} bytes])", self.bytes.len())
    }
}

impl PartialEq for SecureBytes {
    fn eq(&self, other: &Self) -> bool {
        crate::utils::constant_time_eq(&self.bytes, &other.bytes)
    }
}

impl Eq for SecureBytes {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecureBytes::new(b"top secret key!!");
        let shown = format!("{:?}", secret);
        assert!(!shown.contains("top secret"));
        assert!(shown.contains("16 bytes"));
    }

    #[test]
    fn test_extend_and_drain() {
        let mut buf = SecureBytes::with_capacity(4);
        buf.extend_from_slice(&[1, 2, 3]);
        buf.extend_from_slice(&[4, 5, 6, 7, 8]);
        assert_eq!(buf.as_bytes(), &[1, 2, 3, 4, 5, 6, 7, 8]);

        buf.drain_front(3);
        assert_eq!(buf.as_bytes(), &[4, 5, 6, 7, 8]);

        buf.drain_front(100);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_clear_wipes() {
        let mut buf = SecureBytes::new(&[0xaa; 8]);
        buf.clear();
        assert_eq!(buf.len(), 0);
    }
}
