/*!
 * Client Facade
 *
 * [`CryptoCore`] is the request surface of the crate. Every call follows
 * the same path: validate the request, lock the key through the slot
 * store, check the key policy, resolve the driver for the key's location
 * and hand the work to it. Key locks are guards, so they are released on
 * every exit path including errors.
 *
 * One-shot calls live here; multi-part calls are on the operation types
 * in [`crate::operation`], which take a `&CryptoCore` at setup.
 */

use std::fmt;
use std::sync::Arc;

use crate::algorithm::{self, check_key_type, Algorithm, AlgorithmCategory, HashAlgorithm};
use crate::attributes::{KeyAttributes, KeyId, KeyType, KeyUsage, Location};
use crate::config::{CoreConfig, RngConfig, StorageConfig};
use crate::drivers::{
    BuiltinDriver, CipherDirection, CryptoDriver, DriverEntry, DriverTable, OpaqueTestDriver,
    TestDriverHooks, TransparentTestDriver,
};
use crate::error::{CryptoError, CryptoResult};
use crate::rng::{self, fill_random, NvSeedRandom, OsRandom, PseudoRandom, SharedRng, ZeroRandom};
use crate::secure_memory::SecureBytes;
use crate::slots::{
    BuiltinKeyLoader, BuiltinKeyTable, KeyGuard, KeyMaterial, KeySlotStore, SlotReservation, SlotStats,
};
use crate::storage::{FileStorage, KeyStorage, MemoryStorage, StorageFlags, NV_SEED_UID};
use crate::utils::{check_output, constant_time_eq, copy_to_output};

/// Smallest entropy seed accepted by [`CryptoCore::inject_entropy`]
pub const MIN_ENTROPY_SEED_SIZE: usize = 32;
/// Largest entropy seed accepted by [`CryptoCore::inject_entropy`]
pub const MAX_ENTROPY_SEED_SIZE: usize = 1024;

/// Output length of a one-shot cipher encryption, IV included
pub fn cipher_encrypt_output_size(alg: Algorithm, input_len: usize) -> usize {
    let body = match alg {
        Algorithm::CbcPkcs7 => (input_len / 16 + 1) * 16,
        _ => input_len,
    };
    alg.iv_size() + body
}

/// The crypto core: driver table, key slots, storage and random source
pub struct CryptoCore {
    config: CoreConfig,
    drivers: Arc<DriverTable>,
    slots: Arc<KeySlotStore>,
    storage: Arc<dyn KeyStorage>,
    rng: SharedRng,
    hooks: Arc<TestDriverHooks>,
}

impl fmt::Debug for CryptoCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoCore")
            .field("drivers", &self.drivers)
            .field("slots", &self.slots)
            .finish()
    }
}

impl CryptoCore {
    /// Build a core from `config`
    ///
    /// The driver table and the builtin key list are fixed from here on.
    pub fn new(config: CoreConfig) -> CryptoResult<Self> {
        config.validate()?;

        let storage: Arc<dyn KeyStorage> = match &config.storage {
            StorageConfig::Memory => Arc::new(MemoryStorage::new()),
            StorageConfig::Directory { path } => Arc::new(FileStorage::open(path)?),
        };

        let hooks = Arc::new(TestDriverHooks::new());
        let mut entries: Vec<Arc<dyn CryptoDriver>> = Vec::new();
        if config.drivers.accelerator {
            entries.push(Arc::new(TransparentTestDriver::new(Arc::clone(&hooks))));
        }
        entries.push(Arc::new(BuiltinDriver::new()));
        if config.drivers.opaque_test_driver {
            entries.push(Arc::new(OpaqueTestDriver::new(Arc::clone(&hooks))));
        }
        let drivers = Arc::new(DriverTable::new(entries));

        let rng = match config.rng {
            RngConfig::Os => rng::shared(OsRandom),
            RngConfig::NvSeed => rng::shared(NvSeedRandom::from_storage(storage.as_ref())?),
            RngConfig::Zero => rng::shared(ZeroRandom),
            RngConfig::Pseudo { seed } => rng::shared(PseudoRandom::seed_from_u64(seed)),
        };

        let builtin_keys = match &config.builtin_keys {
            Some(entries) => BuiltinKeyTable::new(entries.clone()),
            None => BuiltinKeyTable::test_platform(),
        };
        let loader: Arc<dyn BuiltinKeyLoader> = drivers.clone();
        let slots = Arc::new(KeySlotStore::new(
            config.slot_count,
            Arc::clone(&storage),
            builtin_keys,
            Some(loader),
        ));

        log::info!(
            "Crypto core initialised: {} slots, {} drivers, rng {:?}",
            config.slot_count,
            drivers.entries().len(),
            config.rng
        );
        Ok(Self {
            config,
            drivers,
            slots,
            storage,
            rng,
            hooks,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub(crate) fn drivers(&self) -> &DriverTable {
        &self.drivers
    }

    pub(crate) fn shared_rng(&self) -> SharedRng {
        Arc::clone(&self.rng)
    }

    /// Lock `id` for use with `alg`, checking usage and policy
    pub(crate) fn lock_key(&self, id: KeyId, usage: KeyUsage, alg: Algorithm) -> CryptoResult<KeyGuard> {
        algorithm::lookup(alg)?;
        let guard = self.slots.acquire(id)?;
        let attributes = guard.attributes();
        if !attributes.usage().contains(usage) {
            return Err(CryptoError::not_permitted(
                &alg.to_string(),
                &format!("key {} lacks usage {:?}", id, usage),
            ));
        }
        match attributes.algorithm() {
            Some(policy) if policy.permits(alg) => {}
            _ => {
                return Err(CryptoError::not_permitted(
                    &alg.to_string(),
                    &format!("the policy of key {} does not allow it", id),
                ))
            }
        }
        check_key_type(alg, attributes.key_type(), attributes.bits())?;
        Ok(guard)
    }

    /// Driver servicing `alg` on the key held by `guard`
    pub(crate) fn driver_for(&self, guard: &KeyGuard, alg: Algorithm) -> CryptoResult<DriverEntry> {
        self.drivers
            .resolve(alg.category(), alg, guard.attributes().lifetime().location)
    }

    /// Driver managing keys at the location of `attributes`
    fn key_driver(&self, attributes: &KeyAttributes) -> CryptoResult<DriverEntry> {
        self.drivers.for_location(attributes.lifetime().location)
    }

    fn check_new_key(&self, attributes: &KeyAttributes) -> CryptoResult<()> {
        let lifetime = attributes.lifetime();
        if lifetime.is_read_only() {
            return Err(CryptoError::not_permitted(
                "create key",
                "read-only keys can only be provisioned by a driver",
            ));
        }
        let id = attributes.id();
        if lifetime.is_volatile() {
            if !id.is_null() {
                return Err(CryptoError::invalid_argument(
                    "key id",
                    "no id for a volatile key",
                    &id.to_string(),
                ));
            }
        } else if !id.is_user() {
            return Err(CryptoError::invalid_argument(
                "key id",
                "an id in the user range",
                &id.to_string(),
            ));
        }
        if attributes.key_type() == KeyType::None {
            return Err(CryptoError::invalid_argument("key type", "a key type", "none"));
        }
        Ok(())
    }

    /// Fill a reserved slot, releasing driver-side material if that fails
    fn store_new_key(
        &self,
        entry: &DriverEntry,
        attributes: KeyAttributes,
        material: KeyMaterial,
        reservation: SlotReservation,
    ) -> CryptoResult<KeyId> {
        let cleanup = match &material {
            KeyMaterial::Opaque(handle) => Some(KeyMaterial::Opaque(*handle)),
            KeyMaterial::Raw(_) => None,
        };
        reservation.commit(attributes, material).map_err(|e| {
            if let Some(material) = cleanup {
                if let Err(release) = entry.driver.destroy_key(&material) {
                    log::warn!("Driver '{}' could not release key material: {}", entry.driver.name(), release);
                }
            }
            e
        })
    }

    /// Import key data in the export format of its type
    ///
    /// A non-zero bit size in `attributes` must match the data.
    pub fn import_key(&self, attributes: &KeyAttributes, data: &[u8]) -> CryptoResult<KeyId> {
        self.check_new_key(attributes)?;
        if data.is_empty() {
            return Err(CryptoError::invalid_argument("key data", "at least one byte", "0 bytes"));
        }
        let entry = self.key_driver(attributes)?;
        let reservation = self.slots.reserve(attributes)?;
        let (material, bits) = entry.driver.import_key(attributes, data)?;
        let mut attributes = attributes.clone();
        attributes.set_bits(bits);
        self.store_new_key(&entry, attributes, material, reservation)
    }

    /// Generate a key; `attributes` must give the type and bit size
    pub fn generate_key(&self, attributes: &KeyAttributes) -> CryptoResult<KeyId> {
        self.check_new_key(attributes)?;
        let entry = self.key_driver(attributes)?;
        let reservation = self.slots.reserve(attributes)?;
        let material = {
            let mut rng = self.rng.lock()?;
            entry.driver.generate_key(attributes, &mut **rng)?
        };
        self.store_new_key(&entry, attributes.clone(), material, reservation)
    }

    /// Copy a key, restricting its policy to what both sides allow
    ///
    /// The source needs `COPY` usage. Type and bit size come from the
    /// source; `attributes` supplies lifetime, id, usage and algorithm.
    pub fn copy_key(&self, source: KeyId, attributes: &KeyAttributes) -> CryptoResult<KeyId> {
        let guard = self.slots.acquire(source)?;
        let source_attrs = guard.attributes();
        if !source_attrs.usage().contains(KeyUsage::COPY) {
            return Err(CryptoError::not_permitted("copy key", "the source key lacks COPY usage"));
        }
        if attributes.key_type() != KeyType::None && attributes.key_type() != source_attrs.key_type() {
            return Err(CryptoError::invalid_argument(
                "key type",
                &format!("{:?}", source_attrs.key_type()),
                &format!("{:?}", attributes.key_type()),
            ));
        }
        if attributes.bits() != 0 && attributes.bits() != source_attrs.bits() {
            return Err(CryptoError::invalid_argument(
                "key bits",
                &source_attrs.bits().to_string(),
                &attributes.bits().to_string(),
            ));
        }
        if attributes.lifetime().location != source_attrs.lifetime().location {
            return Err(CryptoError::not_supported("copying a key to another location"));
        }

        let mut target = attributes.clone();
        target.set_key_type(source_attrs.key_type());
        target.set_bits(source_attrs.bits());
        target.set_usage(source_attrs.usage() & attributes.usage());
        target.set_policy(restrict_policy(source_attrs.algorithm(), attributes.algorithm())?);
        self.check_new_key(&target)?;

        let entry = self.key_driver(&target)?;
        let reservation = self.slots.reserve(&target)?;
        let material = entry.driver.copy_key(source_attrs, guard.material())?;
        drop(guard);
        self.store_new_key(&entry, target, material, reservation)
    }

    /// Destroy a key and its backing storage
    ///
    /// Destroying the null id succeeds. A key locked by an operation fails
    /// with `InUse` and is left untouched.
    pub fn destroy_key(&self, id: KeyId) -> CryptoResult<()> {
        if id.is_null() {
            return Ok(());
        }
        let guard = self.slots.acquire(id)?;
        let entry = self.key_driver(guard.attributes())?;
        let material = self.slots.destroy(guard)?;
        if let Err(e) = entry.driver.destroy_key(&material) {
            log::warn!("Driver '{}' failed to release key {}: {}", entry.driver.name(), id, e);
            return Err(e);
        }
        Ok(())
    }

    /// Drop the cached copy of a persistent key
    pub fn purge_key(&self, id: KeyId) -> CryptoResult<()> {
        self.slots.purge(id)
    }

    pub fn get_key_attributes(&self, id: KeyId) -> CryptoResult<KeyAttributes> {
        let guard = self.slots.acquire(id)?;
        Ok(guard.attributes().clone())
    }

    /// Export key material; needs `EXPORT` usage unless the key is public
    pub fn export_key(&self, id: KeyId, out: &mut [u8]) -> CryptoResult<usize> {
        let guard = self.slots.acquire(id)?;
        let attributes = guard.attributes();
        if !attributes.usage().contains(KeyUsage::EXPORT) && !attributes.key_type().is_public_key() {
            return Err(CryptoError::not_permitted("export key", "the key lacks EXPORT usage"));
        }
        let entry = self.key_driver(attributes)?;
        let data = entry.driver.export_key(attributes, guard.material())?;
        copy_to_output(data.as_bytes(), out)
    }

    /// Export the public part of an asymmetric key; always permitted
    pub fn export_public_key(&self, id: KeyId, out: &mut [u8]) -> CryptoResult<usize> {
        let guard = self.slots.acquire(id)?;
        let attributes = guard.attributes();
        if !attributes.key_type().is_asymmetric() {
            return Err(CryptoError::invalid_argument(
                "key type",
                "an asymmetric key",
                &format!("{:?}", attributes.key_type()),
            ));
        }
        let entry = self.key_driver(attributes)?;
        let data = entry.driver.export_public_key(attributes, guard.material())?;
        copy_to_output(&data, out)
    }

    pub fn generate_random(&self, out: &mut [u8]) -> CryptoResult<()> {
        fill_random(&self.rng, out)
    }

    /// Write the injected entropy seed; only the first call succeeds
    pub fn inject_entropy(&self, seed: &[u8]) -> CryptoResult<()> {
        if !(MIN_ENTROPY_SEED_SIZE..=MAX_ENTROPY_SEED_SIZE).contains(&seed.len()) {
            return Err(CryptoError::invalid_argument(
                "seed",
                &format!("{} to {} bytes", MIN_ENTROPY_SEED_SIZE, MAX_ENTROPY_SEED_SIZE),
                &format!("{} bytes", seed.len()),
            ));
        }
        if self.storage.exists(NV_SEED_UID)? {
            return Err(CryptoError::not_permitted("inject entropy", "a seed is already present"));
        }
        self.storage.set(NV_SEED_UID, seed, StorageFlags::WRITE_ONCE)?;
        log::info!("Injected {} bytes of entropy seed", seed.len());
        Ok(())
    }

    fn hash_driver(&self, alg: Algorithm) -> CryptoResult<(DriverEntry, HashAlgorithm)> {
        let info = algorithm::lookup(alg)?;
        let hash = match (info.category, alg.hash()) {
            (AlgorithmCategory::Hash, Some(hash)) => hash,
            _ => {
                return Err(CryptoError::invalid_argument(
                    "algorithm",
                    "a hash algorithm",
                    &alg.to_string(),
                ))
            }
        };
        let entry = self
            .drivers
            .resolve(AlgorithmCategory::Hash, alg, Location::LOCAL_STORAGE)?;
        Ok((entry, hash))
    }

    pub fn hash_compute(&self, alg: Algorithm, input: &[u8], out: &mut [u8]) -> CryptoResult<usize> {
        let (entry, hash) = self.hash_driver(alg)?;
        check_output(alg.output_size(), out)?;
        let digest = entry.driver.hash_compute(hash, input)?;
        copy_to_output(&digest, out)
    }

    /// Compare the hash of `input` with `expected`
    pub fn hash_compare(&self, alg: Algorithm, input: &[u8], expected: &[u8]) -> CryptoResult<()> {
        let (entry, hash) = self.hash_driver(alg)?;
        let digest = entry.driver.hash_compute(hash, input)?;
        if constant_time_eq(&digest, expected) {
            Ok(())
        } else {
            Err(CryptoError::InvalidSignature {
                operation: "hash compare".to_string(),
            })
        }
    }

    fn require_category(alg: Algorithm, category: AlgorithmCategory) -> CryptoResult<()> {
        if alg.category() != category {
            return Err(CryptoError::invalid_argument(
                "algorithm",
                &format!("a {} algorithm", category),
                &alg.to_string(),
            ));
        }
        Ok(())
    }

    pub fn mac_compute(&self, key: KeyId, alg: Algorithm, input: &[u8], out: &mut [u8]) -> CryptoResult<usize> {
        Self::require_category(alg, AlgorithmCategory::Mac)?;
        let guard = self.lock_key(key, KeyUsage::SIGN_MESSAGE, alg)?;
        check_output(alg.output_size(), out)?;
        let entry = self.driver_for(&guard, alg)?;
        let mac = entry
            .driver
            .mac_compute(guard.attributes(), guard.material(), alg, input)?;
        copy_to_output(&mac, out)
    }

    pub fn mac_verify(&self, key: KeyId, alg: Algorithm, input: &[u8], mac: &[u8]) -> CryptoResult<()> {
        Self::require_category(alg, AlgorithmCategory::Mac)?;
        let guard = self.lock_key(key, KeyUsage::VERIFY_MESSAGE, alg)?;
        let entry = self.driver_for(&guard, alg)?;
        let computed = entry
            .driver
            .mac_compute(guard.attributes(), guard.material(), alg, input)?;
        if constant_time_eq(&computed, mac) {
            Ok(())
        } else {
            Err(CryptoError::InvalidSignature {
                operation: "mac verify".to_string(),
            })
        }
    }

    /// Encrypt with a fresh random IV; the output is the IV followed by
    /// the ciphertext
    pub fn cipher_encrypt(&self, key: KeyId, alg: Algorithm, input: &[u8], out: &mut [u8]) -> CryptoResult<usize> {
        Self::require_category(alg, AlgorithmCategory::Cipher)?;
        let guard = self.lock_key(key, KeyUsage::ENCRYPT, alg)?;
        check_output(cipher_encrypt_output_size(alg, input.len()), out)?;
        let entry = self.driver_for(&guard, alg)?;
        let iv_len = alg.iv_size();
        let mut iv = vec![0u8; iv_len];
        fill_random(&self.rng, &mut iv)?;
        let body = entry.driver.cipher_compute(
            guard.attributes(),
            guard.material(),
            alg,
            CipherDirection::Encrypt,
            &iv,
            input,
        )?;
        out[..iv_len].copy_from_slice(&iv);
        let written = copy_to_output(&body, &mut out[iv_len..])?;
        Ok(iv_len + written)
    }

    /// Decrypt the output of [`CryptoCore::cipher_encrypt`]
    pub fn cipher_decrypt(&self, key: KeyId, alg: Algorithm, input: &[u8], out: &mut [u8]) -> CryptoResult<usize> {
        Self::require_category(alg, AlgorithmCategory::Cipher)?;
        let guard = self.lock_key(key, KeyUsage::DECRYPT, alg)?;
        let iv_len = alg.iv_size();
        if input.len() < iv_len {
            return Err(CryptoError::invalid_argument(
                "input",
                &format!("at least the {}-byte IV", iv_len),
                &format!("{} bytes", input.len()),
            ));
        }
        check_output(input.len() - iv_len, out)?;
        let entry = self.driver_for(&guard, alg)?;
        let (iv, body) = input.split_at(iv_len);
        let plaintext = SecureBytes::from(entry.driver.cipher_compute(
            guard.attributes(),
            guard.material(),
            alg,
            CipherDirection::Decrypt,
            iv,
            body,
        )?);
        copy_to_output(plaintext.as_bytes(), out)
    }

    /// One-shot AEAD encryption; the output is the ciphertext followed by
    /// the tag
    pub fn aead_encrypt(
        &self,
        key: KeyId,
        alg: Algorithm,
        nonce: &[u8],
        ad: &[u8],
        plaintext: &[u8],
        out: &mut [u8],
    ) -> CryptoResult<usize> {
        Self::require_category(alg, AlgorithmCategory::Aead)?;
        let guard = self.lock_key(key, KeyUsage::ENCRYPT, alg)?;
        check_output(plaintext.len() + alg.output_size(), out)?;
        let entry = self.driver_for(&guard, alg)?;
        let sealed = entry
            .driver
            .aead_encrypt(guard.attributes(), guard.material(), alg, nonce, ad, plaintext)?;
        copy_to_output(&sealed, out)
    }

    pub fn aead_decrypt(
        &self,
        key: KeyId,
        alg: Algorithm,
        nonce: &[u8],
        ad: &[u8],
        ciphertext: &[u8],
        out: &mut [u8],
    ) -> CryptoResult<usize> {
        Self::require_category(alg, AlgorithmCategory::Aead)?;
        let guard = self.lock_key(key, KeyUsage::DECRYPT, alg)?;
        check_output(ciphertext.len().saturating_sub(alg.output_size()), out)?;
        let entry = self.driver_for(&guard, alg)?;
        let plaintext = entry
            .driver
            .aead_decrypt(guard.attributes(), guard.material(), alg, nonce, ad, ciphertext)?;
        copy_to_output(plaintext.as_bytes(), out)
    }

    fn signing_key(&self, key: KeyId, usage: KeyUsage, alg: Algorithm) -> CryptoResult<(KeyGuard, DriverEntry)> {
        Self::require_category(alg, AlgorithmCategory::Sign)?;
        let guard = self.lock_key(key, usage, alg)?;
        if usage.intersects(KeyUsage::SIGN_HASH | KeyUsage::SIGN_MESSAGE) && !guard.attributes().key_type().is_key_pair() {
            return Err(CryptoError::invalid_argument("key type", "a key pair", "a public key"));
        }
        let entry = self.driver_for(&guard, alg)?;
        Ok((guard, entry))
    }

    fn check_hash_length(alg: Algorithm, hash: &[u8]) -> CryptoResult<()> {
        if alg == Algorithm::PureEddsa {
            return Err(CryptoError::invalid_argument(
                "algorithm",
                "a hash-and-sign algorithm",
                &alg.to_string(),
            ));
        }
        if let Some(h) = alg.hash() {
            if hash.len() != h.output_size() {
                return Err(CryptoError::invalid_argument(
                    "hash",
                    &format!("{} bytes", h.output_size()),
                    &format!("{} bytes", hash.len()),
                ));
            }
        }
        Ok(())
    }

    pub fn sign_hash(&self, key: KeyId, alg: Algorithm, hash: &[u8], out: &mut [u8]) -> CryptoResult<usize> {
        Self::check_hash_length(alg, hash)?;
        let (guard, entry) = self.signing_key(key, KeyUsage::SIGN_HASH, alg)?;
        let signature = {
            let mut rng = self.rng.lock()?;
            entry
                .driver
                .sign_hash(guard.attributes(), guard.material(), alg, hash, &mut **rng)?
        };
        copy_to_output(&signature, out)
    }

    pub fn verify_hash(&self, key: KeyId, alg: Algorithm, hash: &[u8], signature: &[u8]) -> CryptoResult<()> {
        Self::check_hash_length(alg, hash)?;
        let (guard, entry) = self.signing_key(key, KeyUsage::VERIFY_HASH, alg)?;
        entry
            .driver
            .verify_hash(guard.attributes(), guard.material(), alg, hash, signature)
    }

    pub fn sign_message(&self, key: KeyId, alg: Algorithm, message: &[u8], out: &mut [u8]) -> CryptoResult<usize> {
        let (guard, entry) = self.signing_key(key, KeyUsage::SIGN_MESSAGE, alg)?;
        let signature = {
            let mut rng = self.rng.lock()?;
            entry
                .driver
                .sign_message(guard.attributes(), guard.material(), alg, message, &mut **rng)?
        };
        copy_to_output(&signature, out)
    }

    pub fn verify_message(&self, key: KeyId, alg: Algorithm, message: &[u8], signature: &[u8]) -> CryptoResult<()> {
        let (guard, entry) = self.signing_key(key, KeyUsage::VERIFY_MESSAGE, alg)?;
        entry
            .driver
            .verify_message(guard.attributes(), guard.material(), alg, message, signature)
    }

    pub fn asymmetric_encrypt(
        &self,
        key: KeyId,
        alg: Algorithm,
        input: &[u8],
        salt: &[u8],
        out: &mut [u8],
    ) -> CryptoResult<usize> {
        Self::require_category(alg, AlgorithmCategory::AsymmetricEncryption)?;
        let guard = self.lock_key(key, KeyUsage::ENCRYPT, alg)?;
        let entry = self.driver_for(&guard, alg)?;
        let ciphertext = {
            let mut rng = self.rng.lock()?;
            entry
                .driver
                .asymmetric_encrypt(guard.attributes(), guard.material(), alg, input, salt, &mut **rng)?
        };
        copy_to_output(&ciphertext, out)
    }

    pub fn asymmetric_decrypt(
        &self,
        key: KeyId,
        alg: Algorithm,
        input: &[u8],
        salt: &[u8],
        out: &mut [u8],
    ) -> CryptoResult<usize> {
        Self::require_category(alg, AlgorithmCategory::AsymmetricEncryption)?;
        let guard = self.lock_key(key, KeyUsage::DECRYPT, alg)?;
        let entry = self.driver_for(&guard, alg)?;
        let plaintext = {
            let mut rng = self.rng.lock()?;
            entry
                .driver
                .asymmetric_decrypt(guard.attributes(), guard.material(), alg, input, salt, &mut **rng)?
        };
        copy_to_output(plaintext.as_bytes(), out)
    }

    /// Key agreement shared by the raw call and key derivation
    pub(crate) fn agree(
        &self,
        private_key: KeyId,
        usage: KeyUsage,
        alg: Algorithm,
        peer_key: &[u8],
    ) -> CryptoResult<SecureBytes> {
        Self::require_category(alg, AlgorithmCategory::KeyAgreement)?;
        let guard = self.lock_key(private_key, usage, alg)?;
        let entry = self.driver_for(&guard, alg)?;
        entry
            .driver
            .key_agreement(guard.attributes(), guard.material(), alg, peer_key)
    }

    /// Raw shared secret of a key agreement; the key needs `DERIVE`
    pub fn raw_key_agreement(
        &self,
        alg: Algorithm,
        private_key: KeyId,
        peer_key: &[u8],
        out: &mut [u8],
    ) -> CryptoResult<usize> {
        let shared = self.agree(private_key, KeyUsage::DERIVE, alg, peer_key)?;
        copy_to_output(shared.as_bytes(), out)
    }

    /// Slot occupancy, for leak checks
    pub fn stats(&self) -> SlotStats {
        self.slots.stats()
    }

    /// Instrumentation shared by the test drivers
    pub fn test_driver_hooks(&self) -> &Arc<TestDriverHooks> {
        &self.hooks
    }

    pub fn reset_hooks(&self) {
        self.hooks.reset();
    }

    /// Empty every key slot; persistent keys remain in storage
    pub fn teardown(&self) {
        self.slots.wipe_all();
        log::info!("Crypto core torn down");
    }
}

/// Intersect two algorithm policies
///
/// An unset policy permits nothing, so intersecting with it leaves the
/// result unset. Equal policies intersect trivially. A wildcard policy
/// intersected with a concrete member of its family yields the concrete
/// one. Two set policies with nothing in common are rejected.
pub fn restrict_policy(a: Option<Algorithm>, b: Option<Algorithm>) -> CryptoResult<Option<Algorithm>> {
    match (a, b) {
        (None, _) | (_, None) => Ok(None),
        (Some(a), Some(b)) if a == b => Ok(Some(a)),
        (Some(a), Some(b)) if a.permits(b) => Ok(Some(b)),
        (Some(a), Some(b)) if b.permits(a) => Ok(Some(a)),
        (Some(a), Some(b)) => Err(CryptoError::invalid_argument(
            "algorithm policy",
            &format!("a policy compatible with {}", a),
            &b.to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_intersection() {
        let any = Algorithm::Hmac(HashAlgorithm::Any);
        let sha = Algorithm::Hmac(HashAlgorithm::Sha256);
        assert_eq!(restrict_policy(Some(any), Some(sha)).unwrap(), Some(sha));
        assert_eq!(restrict_policy(Some(sha), Some(any)).unwrap(), Some(sha));
        assert_eq!(restrict_policy(None, Some(sha)).unwrap(), None);
        assert_eq!(restrict_policy(Some(any), None).unwrap(), None);
        assert_eq!(restrict_policy(None, None).unwrap(), None);
        assert!(restrict_policy(Some(sha), Some(Algorithm::Ctr)).is_err());
    }

    #[test]
    fn test_cipher_output_size() {
        assert_eq!(cipher_encrypt_output_size(Algorithm::Ctr, 5), 21);
        assert_eq!(cipher_encrypt_output_size(Algorithm::CbcPkcs7, 16), 48);
        assert_eq!(cipher_encrypt_output_size(Algorithm::EcbNoPadding, 32), 32);
        assert_eq!(cipher_encrypt_output_size(Algorithm::StreamCipher, 3), 15);
    }
}
