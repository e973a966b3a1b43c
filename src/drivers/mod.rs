/*!
 * Driver Table and Driver Interface
 *
 * Every backend implements [`CryptoDriver`]. A *transparent* driver is
 * handed raw key bytes; an *opaque* driver owns its key material and is
 * handed an [`OpaqueHandle`](crate::slots::OpaqueHandle) it alone can
 * interpret. The [`DriverTable`] is an ordered list built once when the
 * core starts and never mutated afterwards; resolving the same
 * (category, algorithm, location) always yields the same entry.
 *
 * Multi-part operations are returned as boxed state objects
 * ([`HashOp`], [`MacOp`], [`CipherOp`], [`AeadOp`], [`KdfOp`]). Once an
 * operation is set up it stays bound to the driver that created it.
 */

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::algorithm::{Algorithm, AlgorithmCategory, HashAlgorithm};
use crate::attributes::{KeyAttributes, KeyId, Lifetime, Location};
use crate::error::{CryptoError, CryptoResult};
use crate::rng::RandomSource;
use crate::secure_memory::SecureBytes;
use crate::slots::{BuiltinKeyLoader, KeyMaterial};

pub mod builtin;
pub mod test_driver;

pub use builtin::BuiltinDriver;
pub use test_driver::{DriverHooks, HookCategory, OpaqueTestDriver, TestDriverHooks, TransparentTestDriver};

/// How a driver receives key material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverKind {
    Transparent,
    Opaque,
}

/// Direction of a cipher or AEAD operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherDirection {
    Encrypt,
    Decrypt,
}

/// Streaming hash state
pub trait HashOp: Send {
    fn update(&mut self, input: &[u8]) -> CryptoResult<()>;
    fn finish(self: Box<Self>) -> CryptoResult<Vec<u8>>;
    fn box_clone(&self) -> CryptoResult<Box<dyn HashOp>>;
}

/// Streaming MAC state
pub trait MacOp: Send {
    fn update(&mut self, input: &[u8]) -> CryptoResult<()>;
    fn finish(self: Box<Self>) -> CryptoResult<Vec<u8>>;
    fn box_clone(&self) -> CryptoResult<Box<dyn MacOp>>;
}

/// Streaming cipher state
///
/// Output sizes are exact so the caller can reject a short buffer before
/// any state changes.
pub trait CipherOp: Send {
    fn set_iv(&mut self, iv: &[u8]) -> CryptoResult<()>;
    /// Bytes `update` will write for `input_len` more input bytes
    fn update_output_size(&self, input_len: usize) -> usize;
    fn update(&mut self, input: &[u8], output: &mut [u8]) -> CryptoResult<usize>;
    /// Upper bound on what `finish` will write
    fn finish_output_size(&self) -> usize;
    fn finish(self: Box<Self>, output: &mut [u8]) -> CryptoResult<usize>;
    fn box_clone(&self) -> CryptoResult<Box<dyn CipherOp>>;
}

/// Streaming AEAD state
///
/// Input is buffered until `finish`/`verify`, so decryption never releases
/// unauthenticated plaintext.
pub trait AeadOp: Send {
    fn set_nonce(&mut self, nonce: &[u8]) -> CryptoResult<()>;
    fn update_ad(&mut self, ad: &[u8]) -> CryptoResult<()>;
    fn update(&mut self, input: &[u8]) -> CryptoResult<()>;
    /// Bytes of input accepted so far
    fn input_len(&self) -> usize;
    /// Encrypt: returns (ciphertext, tag)
    fn finish(self: Box<Self>) -> CryptoResult<(Vec<u8>, Vec<u8>)>;
    /// Decrypt: checks the tag and returns the plaintext
    fn verify(self: Box<Self>, tag: &[u8]) -> CryptoResult<SecureBytes>;
    fn box_clone(&self) -> CryptoResult<Box<dyn AeadOp>>;
}

/// Input step of a key derivation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivationStep {
    Secret,
    Salt,
    Info,
    Label,
    Seed,
    Password,
    Cost,
}

/// Key derivation state
pub trait KdfOp: Send {
    fn input_bytes(&mut self, step: DerivationStep, data: &[u8]) -> CryptoResult<()>;
    fn input_integer(&mut self, step: DerivationStep, value: u64) -> CryptoResult<()>;
    /// Whether enough input has been supplied to produce output
    fn ready(&self) -> bool;
    /// Maximum number of bytes this derivation can produce
    fn max_capacity(&self) -> usize;
    fn output(&mut self, out: &mut [u8]) -> CryptoResult<()>;
    fn box_clone(&self) -> CryptoResult<Box<dyn KdfOp>>;
}

fn unsupported<T>(driver: &str, what: &str) -> CryptoResult<T> {
    Err(CryptoError::not_supported(format!("{} in driver '{}'", what, driver)))
}

/// A backend implementing some subset of the algorithms
///
/// Every entry point defaults to `NotSupported`; drivers override what
/// they provide and advertise it through [`CryptoDriver::supports`].
#[allow(unused_variables)]
pub trait CryptoDriver: Send + Sync {
    fn name(&self) -> &'static str;
    fn kind(&self) -> DriverKind;
    /// Location served by an opaque driver (local storage for transparent)
    fn location(&self) -> Location;
    fn supports(&self, alg: Algorithm) -> bool;

    /// Validate and store imported key data, returning material and bit size
    fn import_key(&self, attributes: &KeyAttributes, data: &[u8]) -> CryptoResult<(KeyMaterial, usize)> {
        unsupported(self.name(), "import_key")
    }

    fn generate_key(&self, attributes: &KeyAttributes, rng: &mut dyn RandomSource) -> CryptoResult<KeyMaterial> {
        unsupported(self.name(), "generate_key")
    }

    fn export_key(&self, attributes: &KeyAttributes, material: &KeyMaterial) -> CryptoResult<SecureBytes> {
        unsupported(self.name(), "export_key")
    }

    fn export_public_key(&self, attributes: &KeyAttributes, material: &KeyMaterial) -> CryptoResult<Vec<u8>> {
        unsupported(self.name(), "export_public_key")
    }

    /// Duplicate material for a key copy
    fn copy_key(&self, attributes: &KeyAttributes, material: &KeyMaterial) -> CryptoResult<KeyMaterial> {
        unsupported(self.name(), "copy_key")
    }

    /// Release driver-side resources of a destroyed key
    fn destroy_key(&self, material: &KeyMaterial) -> CryptoResult<()> {
        Ok(())
    }

    fn get_builtin_key(&self, slot_number: u64) -> CryptoResult<(KeyAttributes, KeyMaterial)> {
        unsupported(self.name(), "builtin keys")
    }

    fn hash_setup(&self, alg: HashAlgorithm) -> CryptoResult<Box<dyn HashOp>> {
        unsupported(self.name(), "hash")
    }

    fn hash_compute(&self, alg: HashAlgorithm, input: &[u8]) -> CryptoResult<Vec<u8>> {
        let mut op = self.hash_setup(alg)?;
        op.update(input)?;
        op.finish()
    }

    fn mac_setup(
        &self,
        attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
    ) -> CryptoResult<Box<dyn MacOp>> {
        unsupported(self.name(), "mac")
    }

    fn mac_compute(
        &self,
        attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
        input: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        let mut op = self.mac_setup(attributes, material, alg)?;
        op.update(input)?;
        op.finish()
    }

    fn cipher_setup(
        &self,
        attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
        direction: CipherDirection,
    ) -> CryptoResult<Box<dyn CipherOp>> {
        unsupported(self.name(), "cipher")
    }

    /// One-shot cipher with an explicit IV
    fn cipher_compute(
        &self,
        attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
        direction: CipherDirection,
        iv: &[u8],
        input: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        let mut op = self.cipher_setup(attributes, material, alg, direction)?;
        if !iv.is_empty() || alg.iv_size() > 0 {
            op.set_iv(iv)?;
        }
        let mut out = vec![0u8; op.update_output_size(input.len()) + op.finish_output_size()];
        let written = op.update(input, &mut out)?;
        let tail = op.finish(&mut out[written..])?;
        out.truncate(written + tail);
        Ok(out)
    }

    fn aead_setup(
        &self,
        attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
        direction: CipherDirection,
    ) -> CryptoResult<Box<dyn AeadOp>> {
        unsupported(self.name(), "aead")
    }

    /// One-shot AEAD encryption, returning ciphertext followed by the tag
    fn aead_encrypt(
        &self,
        attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
        nonce: &[u8],
        ad: &[u8],
        plaintext: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        let mut op = self.aead_setup(attributes, material, alg, CipherDirection::Encrypt)?;
        op.set_nonce(nonce)?;
        op.update_ad(ad)?;
        op.update(plaintext)?;
        let (mut ciphertext, tag) = op.finish()?;
        ciphertext.extend_from_slice(&tag);
        Ok(ciphertext)
    }

    /// One-shot AEAD decryption of ciphertext followed by the tag
    fn aead_decrypt(
        &self,
        attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
        nonce: &[u8],
        ad: &[u8],
        ciphertext: &[u8],
    ) -> CryptoResult<SecureBytes> {
        let tag_len = alg.output_size();
        if ciphertext.len() < tag_len {
            return Err(CryptoError::InvalidSignature {
                operation: "aead decrypt: input shorter than the tag".to_string(),
            });
        }
        let (body, tag) = ciphertext.split_at(ciphertext.len() - tag_len);
        let mut op = self.aead_setup(attributes, material, alg, CipherDirection::Decrypt)?;
        op.set_nonce(nonce)?;
        op.update_ad(ad)?;
        op.update(body)?;
        op.verify(tag)
    }

    fn sign_hash(
        &self,
        attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
        hash: &[u8],
        rng: &mut dyn RandomSource,
    ) -> CryptoResult<Vec<u8>> {
        unsupported(self.name(), "sign_hash")
    }

    fn verify_hash(
        &self,
        attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
        hash: &[u8],
        signature: &[u8],
    ) -> CryptoResult<()> {
        unsupported(self.name(), "verify_hash")
    }

    /// Sign a message; the default hashes it and signs the digest
    fn sign_message(
        &self,
        attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
        message: &[u8],
        rng: &mut dyn RandomSource,
    ) -> CryptoResult<Vec<u8>> {
        let hash = alg
            .hash()
            .ok_or_else(|| CryptoError::not_supported(format!("{} on messages", alg)))?;
        let digest = builtin::hash::compute(hash, message)?;
        self.sign_hash(attributes, material, alg, &digest, rng)
    }

    fn verify_message(
        &self,
        attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
        message: &[u8],
        signature: &[u8],
    ) -> CryptoResult<()> {
        let hash = alg
            .hash()
            .ok_or_else(|| CryptoError::not_supported(format!("{} on messages", alg)))?;
        let digest = builtin::hash::compute(hash, message)?;
        self.verify_hash(attributes, material, alg, &digest, signature)
    }

    fn asymmetric_encrypt(
        &self,
        attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
        input: &[u8],
        salt: &[u8],
        rng: &mut dyn RandomSource,
    ) -> CryptoResult<Vec<u8>> {
        unsupported(self.name(), "asymmetric_encrypt")
    }

    fn asymmetric_decrypt(
        &self,
        attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
        input: &[u8],
        salt: &[u8],
        rng: &mut dyn RandomSource,
    ) -> CryptoResult<SecureBytes> {
        unsupported(self.name(), "asymmetric_decrypt")
    }

    fn key_agreement(
        &self,
        attributes: &KeyAttributes,
        material: &KeyMaterial,
        alg: Algorithm,
        peer_key: &[u8],
    ) -> CryptoResult<SecureBytes> {
        unsupported(self.name(), "key_agreement")
    }

    fn key_derivation_setup(&self, alg: Algorithm) -> CryptoResult<Box<dyn KdfOp>> {
        unsupported(self.name(), "key derivation")
    }
}

/// A resolved driver entry
#[derive(Clone)]
pub struct DriverEntry {
    pub index: usize,
    pub driver: Arc<dyn CryptoDriver>,
}

impl fmt::Debug for DriverEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverEntry")
            .field("index", &self.index)
            .field("name", &self.driver.name())
            .field("kind", &self.driver.kind())
            .finish()
    }
}

/// Ordered, immutable list of drivers
///
/// Transparent drivers are tried in registration order, so registering an
/// accelerator before the built-in driver makes it the preferred tier.
/// Every (algorithm, location) pair is routed once when the table is
/// built; resolving afterwards is a single map lookup.
pub struct DriverTable {
    entries: Vec<Arc<dyn CryptoDriver>>,
    routes: HashMap<(Algorithm, Location), usize>,
    owners: HashMap<Location, usize>,
}

impl fmt::Debug for DriverTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|d| (d.name(), d.kind())))
            .finish()
    }
}

/// Whether `driver` handles keys stored at `location`
fn serves(driver: &dyn CryptoDriver, location: Location) -> bool {
    if location.is_local() {
        driver.kind() == DriverKind::Transparent
    } else {
        driver.kind() == DriverKind::Opaque && driver.location() == location
    }
}

impl DriverTable {
    pub fn new(entries: Vec<Arc<dyn CryptoDriver>>) -> Self {
        let mut locations = vec![Location::LOCAL_STORAGE];
        for (index, driver) in entries.iter().enumerate() {
            log::debug!(
                "Driver table entry {}: {} ({:?}, location {:#x})",
                index,
                driver.name(),
                driver.kind(),
                driver.location().0
            );
            if driver.kind() == DriverKind::Opaque && !locations.contains(&driver.location()) {
                locations.push(driver.location());
            }
        }

        let algorithms = Algorithm::all();
        let mut routes = HashMap::new();
        let mut owners = HashMap::new();
        for location in locations {
            let candidates: Vec<usize> = (0..entries.len())
                .filter(|&index| serves(entries[index].as_ref(), location))
                .collect();
            if let Some(&first) = candidates.first() {
                owners.insert(location, first);
            }
            for &alg in &algorithms {
                if let Some(&index) = candidates.iter().find(|&&index| entries[index].supports(alg)) {
                    routes.insert((alg, location), index);
                }
            }
        }
        log::debug!("Driver table routes {} (algorithm, location) pairs", routes.len());

        Self {
            entries,
            routes,
            owners,
        }
    }

    pub fn entries(&self) -> &[Arc<dyn CryptoDriver>] {
        &self.entries
    }

    fn entry(&self, index: usize) -> DriverEntry {
        DriverEntry {
            index,
            driver: Arc::clone(&self.entries[index]),
        }
    }

    /// Resolve the driver servicing `alg` for keys at `location`
    ///
    /// Local storage resolves to the first transparent driver supporting
    /// the algorithm; any other location resolves to the opaque driver
    /// registered for it.
    pub fn resolve(
        &self,
        category: AlgorithmCategory,
        alg: Algorithm,
        location: Location,
    ) -> CryptoResult<DriverEntry> {
        if alg.category() != category {
            return Err(CryptoError::invalid_argument(
                "algorithm",
                &format!("a {} algorithm", category),
                &alg.to_string(),
            ));
        }
        match self.routes.get(&(alg, location)) {
            Some(&index) => {
                let entry = self.entry(index);
                log::trace!("Dispatching {} to driver '{}'", alg, entry.driver.name());
                Ok(entry)
            }
            None => Err(CryptoError::not_supported(format!(
                "{} at location {:#x}",
                alg, location.0
            ))),
        }
    }

    /// Driver owning key management at `location`
    pub fn for_location(&self, location: Location) -> CryptoResult<DriverEntry> {
        self.owners
            .get(&location)
            .map(|&index| self.entry(index))
            .ok_or_else(|| CryptoError::not_supported(format!("key location {:#x}", location.0)))
    }
}

impl BuiltinKeyLoader for DriverTable {
    fn load_builtin_key(
        &self,
        key_id: KeyId,
        lifetime: Lifetime,
        slot_number: u64,
    ) -> CryptoResult<(KeyAttributes, KeyMaterial)> {
        let entry = self.for_location(lifetime.location).map_err(|_| CryptoError::DoesNotExist {
            key_id: key_id.0,
        })?;
        entry.driver.get_builtin_key(slot_number)
    }
}

#[cfg(test)]
mod tests;
