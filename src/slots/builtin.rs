//! Builtin key table
//!
//! Maps reserved key identifiers to a fixed (lifetime, driver slot number)
//! pair. The list is ordered and the first matching entry wins.

use serde::{Deserialize, Serialize};

use crate::attributes::{KeyId, Lifetime, Location, Persistence};
use crate::error::{CryptoError, CryptoResult};

/// Driver slot of the opaque test driver's AES-128 key
pub const TEST_DRIVER_AES_KEY_SLOT: u64 = 0;
/// Driver slot of the opaque test driver's Ed25519 key
pub const TEST_DRIVER_ED25519_KEY_SLOT: u64 = 1;

/// One entry of the builtin key list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltinKeyEntry {
    pub key_id: KeyId,
    pub lifetime: Lifetime,
    pub slot_number: u64,
}

/// Immutable, ordered list of builtin keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuiltinKeyTable {
    entries: Vec<BuiltinKeyEntry>,
}

impl BuiltinKeyTable {
    pub fn new(entries: Vec<BuiltinKeyEntry>) -> Self {
        Self { entries }
    }

    /// The list used with the opaque test driver
    ///
    /// The AES key sits on both boundaries of the builtin range and just
    /// outside it, so range checks in the slot store can be exercised.
    pub fn test_platform() -> Self {
        let read_only = Lifetime::new(Persistence::READ_ONLY, Location::TEST_DRIVER);
        let entry = |id: u32, slot_number: u64| BuiltinKeyEntry {
            key_id: KeyId(id),
            lifetime: read_only,
            slot_number,
        };
        Self::new(vec![
            entry(KeyId::BUILTIN_MIN - 1, TEST_DRIVER_AES_KEY_SLOT),
            entry(KeyId::BUILTIN_MIN, TEST_DRIVER_AES_KEY_SLOT),
            entry(KeyId::BUILTIN_MIN + 1, TEST_DRIVER_ED25519_KEY_SLOT),
            entry(KeyId::BUILTIN_MAX - 1, TEST_DRIVER_AES_KEY_SLOT),
            entry(KeyId::BUILTIN_MAX, TEST_DRIVER_AES_KEY_SLOT),
            entry(KeyId::BUILTIN_MAX + 1, TEST_DRIVER_AES_KEY_SLOT),
        ])
    }

    /// Resolve a key identifier to its lifetime and driver slot number
    pub fn resolve(&self, key_id: KeyId) -> CryptoResult<(Lifetime, u64)> {
        self.entries
            .iter()
            .find(|entry| entry.key_id == key_id)
            .map(|entry| (entry.lifetime, entry.slot_number))
            .ok_or(CryptoError::DoesNotExist { key_id: key_id.0 })
    }

    pub fn entries(&self) -> &[BuiltinKeyEntry] {
        &self.entries
    }
}
