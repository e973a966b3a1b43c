/*!
 * Algorithm Capability Registry
 *
 * Static metadata describing every algorithm the core knows about: its
 * category, its numeric identifier, the key types it accepts and the sizes
 * of its outputs. The registry never changes at runtime and has a single
 * failure mode, an unsupported or unusable algorithm, which is permanent.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::attributes::{EccFamily, KeyType};
use crate::error::{CryptoError, CryptoResult};

/// Hash algorithm parameter, used on its own and inside composite algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    Sha3_256,
    Sha3_384,
    Sha3_512,
    /// Wildcard, only meaningful inside a key policy
    Any,
}

impl HashAlgorithm {
    /// Every hash usable in an operation, the wildcard excluded
    pub const CONCRETE: [HashAlgorithm; 7] = [
        HashAlgorithm::Sha224,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha512,
        HashAlgorithm::Sha3_256,
        HashAlgorithm::Sha3_384,
        HashAlgorithm::Sha3_512,
    ];

    /// Digest length in bytes (0 for the wildcard)
    pub fn output_size(self) -> usize {
        match self {
            HashAlgorithm::Sha224 => 28,
            HashAlgorithm::Sha256 | HashAlgorithm::Sha3_256 => 32,
            HashAlgorithm::Sha384 | HashAlgorithm::Sha3_384 => 48,
            HashAlgorithm::Sha512 | HashAlgorithm::Sha3_512 => 64,
            HashAlgorithm::Any => 0,
        }
    }

    /// Internal block length in bytes, as used by HMAC
    pub fn block_size(self) -> usize {
        match self {
            HashAlgorithm::Sha224 | HashAlgorithm::Sha256 => 64,
            HashAlgorithm::Sha384 | HashAlgorithm::Sha512 => 128,
            HashAlgorithm::Sha3_256 => 136,
            HashAlgorithm::Sha3_384 => 104,
            HashAlgorithm::Sha3_512 => 72,
            HashAlgorithm::Any => 0,
        }
    }

    fn id_bits(self) -> u32 {
        match self {
            HashAlgorithm::Sha224 => 0x08,
            HashAlgorithm::Sha256 => 0x09,
            HashAlgorithm::Sha384 => 0x0a,
            HashAlgorithm::Sha512 => 0x0b,
            HashAlgorithm::Sha3_256 => 0x11,
            HashAlgorithm::Sha3_384 => 0x12,
            HashAlgorithm::Sha3_512 => 0x13,
            HashAlgorithm::Any => 0xff,
        }
    }

    fn from_id_bits(bits: u32) -> Option<Self> {
        Some(match bits {
            0x08 => HashAlgorithm::Sha224,
            0x09 => HashAlgorithm::Sha256,
            0x0a => HashAlgorithm::Sha384,
            0x0b => HashAlgorithm::Sha512,
            0x11 => HashAlgorithm::Sha3_256,
            0x12 => HashAlgorithm::Sha3_384,
            0x13 => HashAlgorithm::Sha3_512,
            0xff => HashAlgorithm::Any,
            _ => return None,
        })
    }
}

/// Algorithm identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    Hash(HashAlgorithm),
    Hmac(HashAlgorithm),
    /// AES in counter mode
    Ctr,
    EcbNoPadding,
    CbcNoPadding,
    CbcPkcs7,
    /// ChaCha20 used as a plain stream cipher
    StreamCipher,
    Gcm,
    ChaCha20Poly1305,
    RsaPkcs1v15Sign(HashAlgorithm),
    /// PKCS#1 v1.5 signature over a caller-prepared digest, no DigestInfo
    RsaPkcs1v15SignRaw,
    RsaPss(HashAlgorithm),
    Ecdsa(HashAlgorithm),
    PureEddsa,
    RsaPkcs1v15Crypt,
    RsaOaep(HashAlgorithm),
    Ecdh,
    Hkdf(HashAlgorithm),
    HkdfExtract(HashAlgorithm),
    HkdfExpand(HashAlgorithm),
    Tls12Prf(HashAlgorithm),
    Pbkdf2Hmac(HashAlgorithm),
}

/// Algorithm category, the unit of driver capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmCategory {
    Hash,
    Mac,
    Cipher,
    Aead,
    Sign,
    AsymmetricEncryption,
    KeyAgreement,
    KeyDerivation,
}

impl fmt::Display for AlgorithmCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AlgorithmCategory::Hash => "hash",
            AlgorithmCategory::Mac => "mac",
            AlgorithmCategory::Cipher => "cipher",
            AlgorithmCategory::Aead => "aead",
            AlgorithmCategory::Sign => "sign",
            AlgorithmCategory::AsymmetricEncryption => "asymmetric encryption",
            AlgorithmCategory::KeyAgreement => "key agreement",
            AlgorithmCategory::KeyDerivation => "key derivation",
        };
        f.write_str(name)
    }
}

/// Static description of one algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlgorithmInfo {
    pub algorithm: Algorithm,
    pub category: AlgorithmCategory,
    pub name: &'static str,
    /// Whether the algorithm consumes a key at setup
    pub requires_key: bool,
}

const HASH_CATEGORY: u32 = 0x0200_0000;
const MAC_HMAC_BASE: u32 = 0x0380_0000;
const SIGN_PKCS1V15_BASE: u32 = 0x0600_0200;
const SIGN_PSS_BASE: u32 = 0x0600_0300;
const SIGN_ECDSA_BASE: u32 = 0x0600_0600;
const CRYPT_OAEP_BASE: u32 = 0x0700_0300;
const KDF_HKDF_BASE: u32 = 0x0800_0100;
const KDF_TLS12_PRF_BASE: u32 = 0x0800_0200;
const KDF_HKDF_EXTRACT_BASE: u32 = 0x0800_0400;
const KDF_HKDF_EXPAND_BASE: u32 = 0x0800_0500;
const KDF_PBKDF2_HMAC_BASE: u32 = 0x0880_0100;

impl Algorithm {
    /// Every concrete algorithm, in a fixed order
    pub fn all() -> Vec<Algorithm> {
        let mut all = vec![
            Algorithm::Ctr,
            Algorithm::EcbNoPadding,
            Algorithm::CbcNoPadding,
            Algorithm::CbcPkcs7,
            Algorithm::StreamCipher,
            Algorithm::Gcm,
            Algorithm::ChaCha20Poly1305,
            Algorithm::RsaPkcs1v15SignRaw,
            Algorithm::PureEddsa,
            Algorithm::RsaPkcs1v15Crypt,
            Algorithm::Ecdh,
        ];
        let families: [fn(HashAlgorithm) -> Algorithm; 11] = [
            Algorithm::Hash,
            Algorithm::Hmac,
            Algorithm::RsaPkcs1v15Sign,
            Algorithm::RsaPss,
            Algorithm::Ecdsa,
            Algorithm::RsaOaep,
            Algorithm::Hkdf,
            Algorithm::HkdfExtract,
            Algorithm::HkdfExpand,
            Algorithm::Tls12Prf,
            Algorithm::Pbkdf2Hmac,
        ];
        for family in families {
            all.extend(HashAlgorithm::CONCRETE.iter().map(|&h| family(h)));
        }
        all
    }

    /// The hash parameter of a composite algorithm, if it has one
    pub fn hash(self) -> Option<HashAlgorithm> {
        match self {
            Algorithm::Hash(h)
            | Algorithm::Hmac(h)
            | Algorithm::RsaPkcs1v15Sign(h)
            | Algorithm::RsaPss(h)
            | Algorithm::Ecdsa(h)
            | Algorithm::RsaOaep(h)
            | Algorithm::Hkdf(h)
            | Algorithm::HkdfExtract(h)
            | Algorithm::HkdfExpand(h)
            | Algorithm::Tls12Prf(h)
            | Algorithm::Pbkdf2Hmac(h) => Some(h),
            _ => None,
        }
    }

    /// The same algorithm with its hash parameter replaced
    pub fn with_hash(self, hash: HashAlgorithm) -> Algorithm {
        match self {
            Algorithm::Hash(_) => Algorithm::Hash(hash),
            Algorithm::Hmac(_) => Algorithm::Hmac(hash),
            Algorithm::RsaPkcs1v15Sign(_) => Algorithm::RsaPkcs1v15Sign(hash),
            Algorithm::RsaPss(_) => Algorithm::RsaPss(hash),
            Algorithm::Ecdsa(_) => Algorithm::Ecdsa(hash),
            Algorithm::RsaOaep(_) => Algorithm::RsaOaep(hash),
            Algorithm::Hkdf(_) => Algorithm::Hkdf(hash),
            Algorithm::HkdfExtract(_) => Algorithm::HkdfExtract(hash),
            Algorithm::HkdfExpand(_) => Algorithm::HkdfExpand(hash),
            Algorithm::Tls12Prf(_) => Algorithm::Tls12Prf(hash),
            Algorithm::Pbkdf2Hmac(_) => Algorithm::Pbkdf2Hmac(hash),
            other => other,
        }
    }

    /// True when the algorithm carries the `Any` hash wildcard
    pub fn is_wildcard(self) -> bool {
        self.hash() == Some(HashAlgorithm::Any)
    }

    pub fn category(self) -> AlgorithmCategory {
        match self {
            Algorithm::Hash(_) => AlgorithmCategory::Hash,
            Algorithm::Hmac(_) => AlgorithmCategory::Mac,
            Algorithm::Ctr
            | Algorithm::EcbNoPadding
            | Algorithm::CbcNoPadding
            | Algorithm::CbcPkcs7
            | Algorithm::StreamCipher => AlgorithmCategory::Cipher,
            Algorithm::Gcm | Algorithm::ChaCha20Poly1305 => AlgorithmCategory::Aead,
            Algorithm::RsaPkcs1v15Sign(_)
            | Algorithm::RsaPkcs1v15SignRaw
            | Algorithm::RsaPss(_)
            | Algorithm::Ecdsa(_)
            | Algorithm::PureEddsa => AlgorithmCategory::Sign,
            Algorithm::RsaPkcs1v15Crypt | Algorithm::RsaOaep(_) => {
                AlgorithmCategory::AsymmetricEncryption
            }
            Algorithm::Ecdh => AlgorithmCategory::KeyAgreement,
            Algorithm::Hkdf(_)
            | Algorithm::HkdfExtract(_)
            | Algorithm::HkdfExpand(_)
            | Algorithm::Tls12Prf(_)
            | Algorithm::Pbkdf2Hmac(_) => AlgorithmCategory::KeyDerivation,
        }
    }

    /// Numeric identifier, compatible with the PSA Crypto API encoding
    pub fn id(self) -> u32 {
        let h = |h: HashAlgorithm| h.id_bits();
        match self {
            Algorithm::Hash(x) => HASH_CATEGORY | h(x),
            Algorithm::Hmac(x) => MAC_HMAC_BASE | h(x),
            Algorithm::Ctr => 0x04c0_1000,
            Algorithm::StreamCipher => 0x0480_0100,
            Algorithm::EcbNoPadding => 0x0440_4400,
            Algorithm::CbcNoPadding => 0x0440_4000,
            Algorithm::CbcPkcs7 => 0x0440_4100,
            Algorithm::Gcm => 0x0550_0200,
            Algorithm::ChaCha20Poly1305 => 0x0510_0500,
            Algorithm::RsaPkcs1v15Sign(x) => SIGN_PKCS1V15_BASE | h(x),
            Algorithm::RsaPkcs1v15SignRaw => SIGN_PKCS1V15_BASE,
            Algorithm::RsaPss(x) => SIGN_PSS_BASE | h(x),
            Algorithm::Ecdsa(x) => SIGN_ECDSA_BASE | h(x),
            Algorithm::PureEddsa => 0x0600_0800,
            Algorithm::RsaPkcs1v15Crypt => 0x0700_0200,
            Algorithm::RsaOaep(x) => CRYPT_OAEP_BASE | h(x),
            Algorithm::Ecdh => 0x0902_0000,
            Algorithm::Hkdf(x) => KDF_HKDF_BASE | h(x),
            Algorithm::HkdfExtract(x) => KDF_HKDF_EXTRACT_BASE | h(x),
            Algorithm::HkdfExpand(x) => KDF_HKDF_EXPAND_BASE | h(x),
            Algorithm::Tls12Prf(x) => KDF_TLS12_PRF_BASE | h(x),
            Algorithm::Pbkdf2Hmac(x) => KDF_PBKDF2_HMAC_BASE | h(x),
        }
    }

    /// Parse a numeric identifier
    pub fn from_id(id: u32) -> CryptoResult<Algorithm> {
        let unknown = || CryptoError::not_supported(format!("algorithm {:#010x}", id));
        let fixed = match id {
            0x04c0_1000 => Some(Algorithm::Ctr),
            0x0480_0100 => Some(Algorithm::StreamCipher),
            0x0440_4400 => Some(Algorithm::EcbNoPadding),
            0x0440_4000 => Some(Algorithm::CbcNoPadding),
            0x0440_4100 => Some(Algorithm::CbcPkcs7),
            0x0550_0200 => Some(Algorithm::Gcm),
            0x0510_0500 => Some(Algorithm::ChaCha20Poly1305),
            SIGN_PKCS1V15_BASE => Some(Algorithm::RsaPkcs1v15SignRaw),
            0x0600_0800 => Some(Algorithm::PureEddsa),
            0x0700_0200 => Some(Algorithm::RsaPkcs1v15Crypt),
            0x0902_0000 => Some(Algorithm::Ecdh),
            _ => None,
        };
        if let Some(alg) = fixed {
            return Ok(alg);
        }

        let hash = HashAlgorithm::from_id_bits(id & 0xff).ok_or_else(unknown)?;
        let alg = match id & !0xff {
            HASH_CATEGORY => Algorithm::Hash(hash),
            MAC_HMAC_BASE => Algorithm::Hmac(hash),
            SIGN_PKCS1V15_BASE => Algorithm::RsaPkcs1v15Sign(hash),
            SIGN_PSS_BASE => Algorithm::RsaPss(hash),
            SIGN_ECDSA_BASE => Algorithm::Ecdsa(hash),
            CRYPT_OAEP_BASE => Algorithm::RsaOaep(hash),
            KDF_HKDF_BASE => Algorithm::Hkdf(hash),
            KDF_HKDF_EXTRACT_BASE => Algorithm::HkdfExtract(hash),
            KDF_HKDF_EXPAND_BASE => Algorithm::HkdfExpand(hash),
            KDF_TLS12_PRF_BASE => Algorithm::Tls12Prf(hash),
            KDF_PBKDF2_HMAC_BASE => Algorithm::Pbkdf2Hmac(hash),
            _ => return Err(unknown()),
        };
        Ok(alg)
    }

    /// Whether a key whose policy is `self` may be used for `requested`
    ///
    /// A policy matches itself, and a policy with the `Any` hash matches the
    /// same algorithm family with any concrete hash.
    pub fn permits(self, requested: Algorithm) -> bool {
        if self == requested {
            return true;
        }
        match (self.hash(), requested.hash()) {
            (Some(HashAlgorithm::Any), Some(h)) if h != HashAlgorithm::Any => {
                self.with_hash(h) == requested
            }
            _ => false,
        }
    }

    /// MAC / digest / tag length produced by this algorithm, in bytes
    pub fn output_size(self) -> usize {
        match self {
            Algorithm::Hash(h) | Algorithm::Hmac(h) => h.output_size(),
            Algorithm::Gcm | Algorithm::ChaCha20Poly1305 => AEAD_TAG_SIZE,
            _ => 0,
        }
    }

    /// IV (cipher) or nonce (AEAD) length expected by the algorithm
    pub fn iv_size(self) -> usize {
        match self {
            Algorithm::Ctr | Algorithm::CbcNoPadding | Algorithm::CbcPkcs7 => 16,
            Algorithm::StreamCipher | Algorithm::Gcm | Algorithm::ChaCha20Poly1305 => 12,
            _ => 0,
        }
    }

    /// Block length the cipher buffers input to (1 for stream-like modes)
    pub fn block_size(self) -> usize {
        match self {
            Algorithm::EcbNoPadding | Algorithm::CbcNoPadding | Algorithm::CbcPkcs7 => 16,
            _ => 1,
        }
    }
}

/// Authentication tag length of every supported AEAD
pub const AEAD_TAG_SIZE: usize = 16;

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.hash() {
            Some(h) => write!(f, "{}({:?})", lookup_name(*self), h),
            None => f.write_str(lookup_name(*self)),
        }
    }
}

fn lookup_name(alg: Algorithm) -> &'static str {
    match alg {
        Algorithm::Hash(_) => "HASH",
        Algorithm::Hmac(_) => "HMAC",
        Algorithm::Ctr => "CTR",
        Algorithm::EcbNoPadding => "ECB_NO_PADDING",
        Algorithm::CbcNoPadding => "CBC_NO_PADDING",
        Algorithm::CbcPkcs7 => "CBC_PKCS7",
        Algorithm::StreamCipher => "STREAM_CIPHER",
        Algorithm::Gcm => "GCM",
        Algorithm::ChaCha20Poly1305 => "CHACHA20_POLY1305",
        Algorithm::RsaPkcs1v15Sign(_) => "RSA_PKCS1V15_SIGN",
        Algorithm::RsaPkcs1v15SignRaw => "RSA_PKCS1V15_SIGN_RAW",
        Algorithm::RsaPss(_) => "RSA_PSS",
        Algorithm::Ecdsa(_) => "ECDSA",
        Algorithm::PureEddsa => "PURE_EDDSA",
        Algorithm::RsaPkcs1v15Crypt => "RSA_PKCS1V15_CRYPT",
        Algorithm::RsaOaep(_) => "RSA_OAEP",
        Algorithm::Ecdh => "ECDH",
        Algorithm::Hkdf(_) => "HKDF",
        Algorithm::HkdfExtract(_) => "HKDF_EXTRACT",
        Algorithm::HkdfExpand(_) => "HKDF_EXPAND",
        Algorithm::Tls12Prf(_) => "TLS12_PRF",
        Algorithm::Pbkdf2Hmac(_) => "PBKDF2_HMAC",
    }
}

/// Look up the static description of an algorithm
///
/// Wildcard algorithms describe policies, not operations, and are
/// rejected with `InvalidArgument`.
pub fn lookup(alg: Algorithm) -> CryptoResult<AlgorithmInfo> {
    if alg.is_wildcard() {
        return Err(CryptoError::invalid_argument(
            "algorithm",
            "a concrete algorithm",
            &alg.to_string(),
        ));
    }
    let category = alg.category();
    Ok(AlgorithmInfo {
        algorithm: alg,
        category,
        name: lookup_name(alg),
        requires_key: category != AlgorithmCategory::Hash,
    })
}

/// Check that a key of `key_type` / `bits` can be used with `alg`
///
/// Key derivation inputs are checked per step by the derivation operation
/// instead, so KDF algorithms accept any derivation-capable key here.
pub fn check_key_type(alg: Algorithm, key_type: KeyType, bits: usize) -> CryptoResult<()> {
    let ok = match alg {
        Algorithm::Hash(_) => false,
        Algorithm::Hmac(_) => key_type == KeyType::Hmac,
        Algorithm::Ctr
        | Algorithm::EcbNoPadding
        | Algorithm::CbcNoPadding
        | Algorithm::CbcPkcs7
        | Algorithm::Gcm => key_type == KeyType::Aes && matches!(bits, 128 | 192 | 256),
        Algorithm::StreamCipher | Algorithm::ChaCha20Poly1305 => {
            key_type == KeyType::ChaCha20 && bits == 256
        }
        Algorithm::RsaPkcs1v15Sign(_)
        | Algorithm::RsaPkcs1v15SignRaw
        | Algorithm::RsaPss(_)
        | Algorithm::RsaPkcs1v15Crypt
        | Algorithm::RsaOaep(_) => {
            matches!(key_type, KeyType::RsaKeyPair | KeyType::RsaPublicKey)
        }
        Algorithm::Ecdsa(_) => matches!(
            key_type,
            KeyType::EccKeyPair(EccFamily::SecpR1) | KeyType::EccPublicKey(EccFamily::SecpR1)
        ),
        Algorithm::PureEddsa => matches!(
            key_type,
            KeyType::EccKeyPair(EccFamily::TwistedEdwards)
                | KeyType::EccPublicKey(EccFamily::TwistedEdwards)
        ),
        Algorithm::Ecdh => matches!(key_type, KeyType::EccKeyPair(_)),
        Algorithm::Hkdf(_)
        | Algorithm::HkdfExtract(_)
        | Algorithm::HkdfExpand(_)
        | Algorithm::Tls12Prf(_)
        | Algorithm::Pbkdf2Hmac(_) => matches!(
            key_type,
            KeyType::Derive | KeyType::Password | KeyType::RawData
        ),
    };
    if ok {
        Ok(())
    } else {
        Err(CryptoError::invalid_argument(
            "key type",
            &format!("a key compatible with {}", alg),
            &format!("{:?} ({} bits)", key_type, bits),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_round_trip_known_values() {
        assert_eq!(Algorithm::Hash(HashAlgorithm::Sha256).id(), 0x0200_0009);
        assert_eq!(Algorithm::Hmac(HashAlgorithm::Sha256).id(), 0x0380_0009);
        assert_eq!(Algorithm::RsaPss(HashAlgorithm::Any).id(), 0x0600_03ff);
        assert_eq!(
            Algorithm::from_id(0x0600_0200).unwrap(),
            Algorithm::RsaPkcs1v15SignRaw
        );
        assert_eq!(
            Algorithm::from_id(0x0800_0109).unwrap(),
            Algorithm::Hkdf(HashAlgorithm::Sha256)
        );
    }

    #[test]
    fn test_unknown_identifier_is_not_supported() {
        let err = Algorithm::from_id(0x7fff_0001).unwrap_err();
        assert!(matches!(err, CryptoError::NotSupported { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_wildcard_policy() {
        let policy = Algorithm::Hmac(HashAlgorithm::Any);
        assert!(policy.permits(Algorithm::Hmac(HashAlgorithm::Sha384)));
        assert!(!policy.permits(Algorithm::RsaPss(HashAlgorithm::Sha384)));
        assert!(!Algorithm::Hmac(HashAlgorithm::Sha256)
            .permits(Algorithm::Hmac(HashAlgorithm::Sha384)));
        assert!(Algorithm::Ctr.permits(Algorithm::Ctr));
    }

    #[test]
    fn test_all_lists_each_concrete_algorithm_once() {
        let all = Algorithm::all();
        assert_eq!(all.len(), 11 + 11 * 7);
        let unique: std::collections::HashSet<_> = all.iter().copied().collect();
        assert_eq!(unique.len(), all.len());
        assert!(all.iter().all(|alg| lookup(*alg).is_ok()));
        for alg in all {
            assert_eq!(Algorithm::from_id(alg.id()).unwrap(), alg);
        }
    }

    #[test]
    fn test_lookup_rejects_wildcard() {
        assert!(lookup(Algorithm::Hmac(HashAlgorithm::Any)).is_err());
        let info = lookup(Algorithm::Gcm).unwrap();
        assert_eq!(info.category, AlgorithmCategory::Aead);
        assert!(info.requires_key);
        assert!(!lookup(Algorithm::Hash(HashAlgorithm::Sha256)).unwrap().requires_key);
    }

    #[test]
    fn test_key_type_constraints() {
        assert!(check_key_type(Algorithm::Ctr, KeyType::Aes, 256).is_ok());
        assert!(check_key_type(Algorithm::Ctr, KeyType::Aes, 100).is_err());
        assert!(check_key_type(Algorithm::StreamCipher, KeyType::ChaCha20, 256).is_ok());
        assert!(check_key_type(Algorithm::Gcm, KeyType::ChaCha20, 256).is_err());
        assert!(check_key_type(
            Algorithm::PureEddsa,
            KeyType::EccKeyPair(EccFamily::TwistedEdwards),
            255
        )
        .is_ok());
    }
}
