/*!
 * Core Configuration
 *
 * Everything fixed when a [`CryptoCore`](crate::client::CryptoCore) starts:
 * slot count, storage backend, registered drivers, random source and the
 * builtin key list. Configurations are plain serde structures and can be
 * loaded from JSON.
 */

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CryptoError, CryptoResult};
use crate::slots::{BuiltinKeyEntry, DEFAULT_SLOT_COUNT};

/// Where persistent keys are kept
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageConfig {
    /// In-process map, lost when the core is dropped
    Memory,
    /// One file per uid under `path`
    Directory { path: PathBuf },
}

impl StorageConfig {
    /// Directory storage at the platform's local data directory
    pub fn default_directory() -> Self {
        let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("qasa-psa");
        StorageConfig::Directory { path }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Memory
    }
}

/// Drivers registered in addition to the built-in software driver
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Register the transparent test accelerator ahead of the built-in driver
    pub accelerator: bool,
    /// Register the opaque test driver at location `0x7fffff`
    pub opaque_test_driver: bool,
}

/// Random source used by the core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RngConfig {
    /// Operating-system randomness
    Os,
    /// DRBG seeded from the injected entropy seed
    NvSeed,
    /// All-zero output, tests only
    Zero,
    /// Reproducible ChaCha20 stream, tests only
    Pseudo { seed: u64 },
}

impl Default for RngConfig {
    fn default() -> Self {
        RngConfig::Os
    }
}

/// Configuration of a crypto core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub slot_count: usize,
    pub storage: StorageConfig,
    pub drivers: DriverConfig,
    pub rng: RngConfig,
    /// Builtin key list; `None` selects the test platform list
    pub builtin_keys: Option<Vec<BuiltinKeyEntry>>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            slot_count: DEFAULT_SLOT_COUNT,
            storage: StorageConfig::Memory,
            drivers: DriverConfig::default(),
            rng: RngConfig::Os,
            builtin_keys: None,
        }
    }
}

impl CoreConfig {
    /// Configuration with every test driver registered and a seeded RNG
    pub fn testing(seed: u64) -> Self {
        Self {
            drivers: DriverConfig {
                accelerator: true,
                opaque_test_driver: true,
            },
            rng: RngConfig::Pseudo { seed },
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> CryptoResult<Self> {
        let config: CoreConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> CryptoResult<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_json(&contents)
    }

    pub fn to_json(&self) -> CryptoResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject configurations the core cannot run with
    pub fn validate(&self) -> CryptoResult<()> {
        if self.slot_count == 0 || self.slot_count > 0x1_0000 {
            return Err(CryptoError::invalid_argument(
                "slot_count",
                "between 1 and 65536",
                &self.slot_count.to_string(),
            ));
        }
        if let Some(entries) = &self.builtin_keys {
            if let Some(entry) = entries.iter().find(|e| e.lifetime.is_volatile()) {
                return Err(CryptoError::invalid_argument(
                    "builtin_keys",
                    "non-volatile lifetimes",
                    &entry.key_id.to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{KeyId, Lifetime, Location, Persistence};

    #[test]
    fn test_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.slot_count, 32);
        assert_eq!(config.storage, StorageConfig::Memory);
        assert!(!config.drivers.accelerator);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_round_trip() {
        let mut config = CoreConfig::testing(7);
        config.builtin_keys = Some(vec![BuiltinKeyEntry {
            key_id: KeyId(KeyId::BUILTIN_MIN),
            lifetime: Lifetime::new(Persistence::READ_ONLY, Location::TEST_DRIVER),
            slot_number: 0,
        }]);
        let json = config.to_json().unwrap();
        assert_eq!(CoreConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = CoreConfig::from_json(
            r#"{ "slot_count": 4, "rng": { "kind": "pseudo", "seed": 3 } }"#,
        )
        .unwrap();
        assert_eq!(config.slot_count, 4);
        assert_eq!(config.rng, RngConfig::Pseudo { seed: 3 });
        assert_eq!(config.storage, StorageConfig::Memory);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(CoreConfig::from_json(r#"{ "slot_count": 0 }"#).is_err());
        assert!(CoreConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_default_directory_is_named_after_crate() {
        match StorageConfig::default_directory() {
            StorageConfig::Directory { path } => assert!(path.ends_with("qasa-psa")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
