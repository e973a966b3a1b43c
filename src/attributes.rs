/*!
 * Key Attributes
 *
 * Key types, usage flags, lifetimes (persistence + location), key
 * identifiers and the attribute structure that carries them from the
 * caller into a key slot.
 */

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::algorithm::Algorithm;
use crate::error::{CryptoError, CryptoResult};
use crate::utils::copy_to_output;

/// Elliptic curve family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EccFamily {
    /// Short Weierstrass curves over prime fields (secp256r1 ...)
    SecpR1,
    /// Curve25519 for key agreement
    Montgomery,
    /// Edwards25519 for EdDSA
    TwistedEdwards,
}

/// Key type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    None,
    RawData,
    Hmac,
    Derive,
    Password,
    Aes,
    ChaCha20,
    RsaKeyPair,
    RsaPublicKey,
    EccKeyPair(EccFamily),
    EccPublicKey(EccFamily),
}

impl KeyType {
    pub fn is_asymmetric(self) -> bool {
        self.is_key_pair() || self.is_public_key()
    }

    pub fn is_key_pair(self) -> bool {
        matches!(self, KeyType::RsaKeyPair | KeyType::EccKeyPair(_))
    }

    pub fn is_public_key(self) -> bool {
        matches!(self, KeyType::RsaPublicKey | KeyType::EccPublicKey(_))
    }

    /// The public-key type matching a key pair (identity for other types)
    pub fn public_key_of(self) -> KeyType {
        match self {
            KeyType::RsaKeyPair => KeyType::RsaPublicKey,
            KeyType::EccKeyPair(family) => KeyType::EccPublicKey(family),
            other => other,
        }
    }

    /// Types whose material is an arbitrary byte string
    pub fn is_unstructured(self) -> bool {
        matches!(
            self,
            KeyType::RawData | KeyType::Hmac | KeyType::Derive | KeyType::Password
        )
    }
}

bitflags! {
    /// Usage flags of a key policy
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct KeyUsage: u32 {
        const EXPORT = 0x0000_0001;
        const COPY = 0x0000_0002;
        const CACHE = 0x0000_0004;
        const ENCRYPT = 0x0000_0100;
        const DECRYPT = 0x0000_0200;
        const SIGN_MESSAGE = 0x0000_0400;
        const VERIFY_MESSAGE = 0x0000_0800;
        const SIGN_HASH = 0x0000_1000;
        const VERIFY_HASH = 0x0000_2000;
        const DERIVE = 0x0000_4000;
        const VERIFY_DERIVATION = 0x0000_8000;
    }
}

impl KeyUsage {
    /// Widen hash-signing usages to their message counterparts
    ///
    /// One-way and idempotent: `u.normalized().normalized() == u.normalized()`.
    pub fn normalized(self) -> KeyUsage {
        let mut usage = self;
        if usage.contains(KeyUsage::SIGN_HASH) {
            usage |= KeyUsage::SIGN_MESSAGE;
        }
        if usage.contains(KeyUsage::VERIFY_HASH) {
            usage |= KeyUsage::VERIFY_MESSAGE;
        }
        usage
    }
}

/// Persistence level of a lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Persistence(pub u8);

impl Persistence {
    pub const VOLATILE: Persistence = Persistence(0x00);
    pub const DEFAULT: Persistence = Persistence(0x01);
    pub const READ_ONLY: Persistence = Persistence(0xff);
}

/// Location of a key: which driver owns its material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Location(pub u32);

impl Location {
    /// Transparent keys stored in the core's own slots
    pub const LOCAL_STORAGE: Location = Location(0x00_0000);
    /// The opaque test driver
    pub const TEST_DRIVER: Location = Location(0x7f_ffff);

    pub fn is_local(self) -> bool {
        self == Location::LOCAL_STORAGE
    }
}

/// Key lifetime: persistence level combined with a location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Lifetime {
    pub persistence: Persistence,
    pub location: Location,
}

impl Lifetime {
    pub const VOLATILE: Lifetime = Lifetime::new(Persistence::VOLATILE, Location::LOCAL_STORAGE);
    pub const PERSISTENT: Lifetime = Lifetime::new(Persistence::DEFAULT, Location::LOCAL_STORAGE);

    pub const fn new(persistence: Persistence, location: Location) -> Self {
        Self {
            persistence,
            location,
        }
    }

    /// Decode the `location << 8 | persistence` form
    pub fn from_raw(raw: u32) -> Self {
        Self {
            persistence: Persistence((raw & 0xff) as u8),
            location: Location(raw >> 8),
        }
    }

    pub fn raw(self) -> u32 {
        (self.location.0 << 8) | self.persistence.0 as u32
    }

    pub fn is_volatile(self) -> bool {
        self.persistence == Persistence::VOLATILE
    }

    pub fn is_read_only(self) -> bool {
        self.persistence == Persistence::READ_ONLY
    }
}

impl Default for Lifetime {
    fn default() -> Self {
        Lifetime::VOLATILE
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.raw())
    }
}

/// Key identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(pub u32);

impl KeyId {
    pub const NULL: KeyId = KeyId(0);
    pub const USER_MIN: u32 = 0x0000_0001;
    pub const USER_MAX: u32 = 0x3fff_ffff;
    pub const VENDOR_MIN: u32 = 0x4000_0000;
    pub const VENDOR_MAX: u32 = 0x7fff_ffff;
    pub const BUILTIN_MIN: u32 = 0x7fff_0000;
    pub const BUILTIN_MAX: u32 = 0x7fff_efff;

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    pub fn is_user(self) -> bool {
        (Self::USER_MIN..=Self::USER_MAX).contains(&self.0)
    }

    pub fn is_vendor(self) -> bool {
        (Self::VENDOR_MIN..=Self::VENDOR_MAX).contains(&self.0)
    }

    pub fn is_builtin(self) -> bool {
        (Self::BUILTIN_MIN..=Self::BUILTIN_MAX).contains(&self.0)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl From<u32> for KeyId {
    fn from(id: u32) -> Self {
        KeyId(id)
    }
}

/// Attributes describing a key: what it is, what it may do, where it lives
///
/// # Example
///
/// ```
/// use qasa_psa::prelude::*;
///
/// let attrs = KeyAttributes::new()
///     .with_type(KeyType::Aes)
///     .with_bits(256)
///     .with_usage(KeyUsage::ENCRYPT | KeyUsage::DECRYPT)
///     .with_algorithm(Algorithm::Ctr);
/// assert!(attrs.lifetime().is_volatile());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyAttributes {
    key_type: Option<KeyType>,
    bits: usize,
    usage: KeyUsage,
    algorithm: Option<Algorithm>,
    lifetime: Lifetime,
    id: KeyId,
    domain_parameters: Vec<u8>,
}

impl Default for KeyUsage {
    fn default() -> Self {
        KeyUsage::empty()
    }
}

impl KeyAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type.unwrap_or(KeyType::None)
    }

    pub fn bits(&self) -> usize {
        self.bits
    }

    pub fn usage(&self) -> KeyUsage {
        self.usage
    }

    pub fn algorithm(&self) -> Option<Algorithm> {
        self.algorithm
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub fn id(&self) -> KeyId {
        self.id
    }

    pub fn set_key_type(&mut self, key_type: KeyType) {
        self.key_type = Some(key_type);
    }

    pub fn set_bits(&mut self, bits: usize) {
        self.bits = bits;
    }

    /// Set usage flags; the stored value is always normalized
    pub fn set_usage(&mut self, usage: KeyUsage) {
        self.usage = usage.normalized();
    }

    pub fn set_algorithm(&mut self, algorithm: Algorithm) {
        self.algorithm = Some(algorithm);
    }

    /// Replace the algorithm policy; `None` permits no algorithm
    pub fn set_policy(&mut self, algorithm: Option<Algorithm>) {
        self.algorithm = algorithm;
    }

    /// Set the lifetime; a volatile lifetime clears any identifier
    pub fn set_lifetime(&mut self, lifetime: Lifetime) {
        self.lifetime = lifetime;
        if lifetime.is_volatile() {
            self.id = KeyId::NULL;
        }
    }

    /// Set a persistent identifier
    ///
    /// A volatile lifetime is upgraded to the default persistence at the
    /// same location, so that setting an id alone declares a persistent key.
    pub fn set_id(&mut self, id: KeyId) {
        self.id = id;
        if self.lifetime.is_volatile() {
            self.lifetime = Lifetime::new(Persistence::DEFAULT, self.lifetime.location);
        }
    }

    pub fn with_type(mut self, key_type: KeyType) -> Self {
        self.set_key_type(key_type);
        self
    }

    pub fn with_bits(mut self, bits: usize) -> Self {
        self.set_bits(bits);
        self
    }

    pub fn with_usage(mut self, usage: KeyUsage) -> Self {
        self.set_usage(usage);
        self
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.set_algorithm(algorithm);
        self
    }

    pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
        self.set_lifetime(lifetime);
        self
    }

    pub fn with_id(mut self, id: impl Into<KeyId>) -> Self {
        self.set_id(id.into());
        self
    }

    /// Normalize in place: widen usage flags
    pub fn normalize(&mut self) {
        self.usage = self.usage.normalized();
    }

    /// Attach domain parameters to the attributes
    ///
    /// For RSA key pairs the parameters are the big-endian public exponent
    /// used by key generation; an empty buffer selects the default 65537.
    pub fn set_domain_parameters(&mut self, key_type: KeyType, data: &[u8]) -> CryptoResult<()> {
        if !data.is_empty() && !matches!(key_type, KeyType::RsaKeyPair | KeyType::RsaPublicKey) {
            return Err(CryptoError::not_supported(format!(
                "domain parameters for {:?}",
                key_type
            )));
        }
        self.key_type = Some(key_type);
        self.domain_parameters = data.to_vec();
        Ok(())
    }

    /// Copy domain parameters into `out`, returning their length
    pub fn domain_parameters(&self, out: &mut [u8]) -> CryptoResult<usize> {
        copy_to_output(&self.domain_parameters, out)
    }

    pub fn domain_parameters_size(&self) -> usize {
        self.domain_parameters.len()
    }

    pub(crate) fn domain_parameter_bytes(&self) -> &[u8] {
        &self.domain_parameters
    }

    /// Return the attributes to their freshly-initialized state
    pub fn reset(&mut self) {
        *self = KeyAttributes::default();
    }

    pub(crate) fn set_id_raw(&mut self, id: KeyId) {
        self.id = id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_lifetime_encoding() {
        let lifetime = Lifetime::new(Persistence::READ_ONLY, Location::TEST_DRIVER);
        assert_eq!(lifetime.raw(), 0x7fff_ffff);
        assert_eq!(Lifetime::from_raw(0x7fff_ffff), lifetime);
        assert_eq!(Lifetime::PERSISTENT.raw(), 1);
        assert!(Lifetime::from_raw(0).is_volatile());
    }

    #[test]
    fn test_set_id_makes_persistent() {
        let mut attrs = KeyAttributes::new();
        attrs.set_id(KeyId(42));
        assert_eq!(attrs.lifetime(), Lifetime::PERSISTENT);

        attrs.set_lifetime(Lifetime::VOLATILE);
        assert!(attrs.id().is_null());
    }

    #[test]
    fn test_usage_normalization() {
        let attrs = KeyAttributes::new().with_usage(KeyUsage::SIGN_HASH | KeyUsage::VERIFY_HASH);
        assert!(attrs.usage().contains(KeyUsage::SIGN_MESSAGE));
        assert!(attrs.usage().contains(KeyUsage::VERIFY_MESSAGE));

        let plain = KeyUsage::SIGN_MESSAGE.normalized();
        assert!(!plain.contains(KeyUsage::SIGN_HASH));
    }

    #[test]
    fn test_domain_parameters() {
        let mut attrs = KeyAttributes::new();
        attrs
            .set_domain_parameters(KeyType::RsaKeyPair, &[0x01, 0x00, 0x01])
            .unwrap();
        assert_eq!(attrs.domain_parameters_size(), 3);

        let mut small = [0u8; 2];
        assert!(matches!(
            attrs.domain_parameters(&mut small),
            Err(CryptoError::BufferTooSmall { .. })
        ));
        let mut out = [0u8; 8];
        assert_eq!(attrs.domain_parameters(&mut out).unwrap(), 3);
        assert_eq!(&out[..3], &[0x01, 0x00, 0x01]);

        assert!(attrs.set_domain_parameters(KeyType::Aes, &[1]).is_err());

        attrs.reset();
        assert_eq!(attrs, KeyAttributes::default());
    }

    #[test]
    fn test_key_id_ranges() {
        assert!(KeyId(1).is_user());
        assert!(KeyId(0x4000_0000).is_vendor());
        assert!(KeyId(0x7fff_0000).is_builtin());
        assert!(KeyId(0x7fff_0000).is_vendor());
        assert!(!KeyId(0x7fff_f000).is_builtin());
    }

    proptest! {
        #[test]
        fn prop_normalization_idempotent(bits in any::<u32>()) {
            let usage = KeyUsage::from_bits_truncate(bits);
            let once = usage.normalized();
            prop_assert_eq!(once.normalized(), once);
            prop_assert!(once.contains(usage));
            if usage.contains(KeyUsage::SIGN_HASH) {
                prop_assert!(once.contains(KeyUsage::SIGN_MESSAGE));
            }
            if usage.contains(KeyUsage::VERIFY_HASH) {
                prop_assert!(once.contains(KeyUsage::VERIFY_MESSAGE));
            }
        }
    }
}
