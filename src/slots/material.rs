//! Key material owned by a slot

use crate::attributes::Location;
use crate::error::{CryptoError, CryptoResult};
use crate::secure_memory::SecureBytes;

/// Reference to key material held by an opaque driver
///
/// The core never interprets `slot_number`; only the driver registered at
/// `location` knows what it designates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpaqueHandle {
    pub location: Location,
    pub slot_number: u64,
}

/// What a full slot holds
#[derive(Debug)]
pub enum KeyMaterial {
    /// Raw key bytes in the driver-independent export format
    Raw(SecureBytes),
    Opaque(OpaqueHandle),
}

impl KeyMaterial {
    /// Raw bytes, for transparent drivers
    pub fn raw(&self) -> CryptoResult<&[u8]> {
        match self {
            KeyMaterial::Raw(bytes) => Ok(bytes.as_bytes()),
            KeyMaterial::Opaque(handle) => Err(CryptoError::invalid_argument(
                "key material",
                "transparent key bytes",
                &format!("opaque key at location {:#x}", handle.location.0),
            )),
        }
    }

    /// Opaque handle, for the driver owning the location
    pub fn opaque(&self) -> CryptoResult<OpaqueHandle> {
        match self {
            KeyMaterial::Opaque(handle) => Ok(*handle),
            KeyMaterial::Raw(_) => Err(CryptoError::invalid_argument(
                "key material",
                "an opaque handle",
                "transparent key bytes",
            )),
        }
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self, KeyMaterial::Opaque(_))
    }
}
