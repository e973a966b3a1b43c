//! On-storage representation of a persistent key
//!
//! Layout: the 8-byte magic `PSA\0KEY\0`, a little-endian `u32` format
//! version, then the bincode-encoded attributes and material.

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::attributes::KeyAttributes;
use crate::error::{CryptoError, CryptoResult};
use crate::secure_memory::SecureBytes;
use crate::slots::{KeyMaterial, OpaqueHandle};

pub const KEY_MAGIC: &[u8; 8] = b"PSA\0KEY\0";
pub const KEY_FORMAT_VERSION: u32 = 0;

const HEADER_LEN: usize = KEY_MAGIC.len() + 4;

#[derive(Serialize, Deserialize)]
enum StoredMaterial {
    Raw(Vec<u8>),
    Opaque { slot_number: u64 },
}

#[derive(Serialize, Deserialize)]
struct StoredKey {
    attributes: KeyAttributes,
    material: StoredMaterial,
}

impl Drop for StoredKey {
    fn drop(&mut self) {
        if let StoredMaterial::Raw(bytes) = &mut self.material {
            bytes.zeroize();
        }
    }
}

/// Serialize a key for storage
pub fn encode_key(attributes: &KeyAttributes, material: &KeyMaterial) -> CryptoResult<SecureBytes> {
    let material = match material {
        KeyMaterial::Raw(bytes) => StoredMaterial::Raw(bytes.as_bytes().to_vec()),
        KeyMaterial::Opaque(handle) => StoredMaterial::Opaque {
            slot_number: handle.slot_number,
        },
    };
    let stored = StoredKey {
        attributes: attributes.clone(),
        material,
    };
    let body = SecureBytes::from(bincode::serialize(&stored)?);

    let mut out = SecureBytes::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(KEY_MAGIC);
    out.extend_from_slice(&KEY_FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(body.as_bytes());
    Ok(out)
}

/// Parse a stored key
///
/// A bad header yields `DataCorrupt`; an undecodable body yields
/// `DataInvalid`.
pub fn decode_key(uid: u64, data: &[u8]) -> CryptoResult<(KeyAttributes, KeyMaterial)> {
    if data.len() < HEADER_LEN || &data[..KEY_MAGIC.len()] != KEY_MAGIC {
        return Err(CryptoError::DataCorrupt {
            uid,
            cause: "missing key header".to_string(),
        });
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&data[KEY_MAGIC.len()..HEADER_LEN]);
    let version = u32::from_le_bytes(version);
    if version != KEY_FORMAT_VERSION {
        return Err(CryptoError::DataCorrupt {
            uid,
            cause: format!("unknown key format version {}", version),
        });
    }

    let stored: StoredKey = bincode::deserialize(&data[HEADER_LEN..])?;
    let location = stored.attributes.lifetime().location;
    let material = match &stored.material {
        StoredMaterial::Raw(bytes) => KeyMaterial::Raw(SecureBytes::new(bytes)),
        StoredMaterial::Opaque { slot_number } => KeyMaterial::Opaque(OpaqueHandle {
            location,
            slot_number: *slot_number,
        }),
    };
    Ok((stored.attributes.clone(), material))
}
