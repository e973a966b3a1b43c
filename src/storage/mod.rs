/*!
 * Persistent Storage Collaborator
 *
 * A small key-value interface keyed by numeric uid. The core uses it for
 * persistent keys (uid = key id) and for the injected entropy seed. Two
 * backends are provided: an in-memory map for tests and volatile setups,
 * and a directory of files.
 */

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{CryptoError, CryptoResult};
use crate::secure_memory::SecureBytes;

mod key_format;

pub use key_format::{decode_key, encode_key, KEY_FORMAT_VERSION, KEY_MAGIC};

/// Storage uid of the injected entropy seed
pub const NV_SEED_UID: u64 = 0xffff_ff52;

bitflags! {
    /// Flags attached to a stored entry
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct StorageFlags: u32 {
        /// The entry can be written once and never modified or removed
        const WRITE_ONCE = 0x0000_0001;
    }
}

/// Metadata of a stored entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageInfo {
    pub size: usize,
    pub flags: StorageFlags,
}

/// Key-value store used for persistent keys
pub trait KeyStorage: Send + Sync {
    /// Read `length` bytes starting at `offset`
    fn get(&self, uid: u64, offset: usize, length: usize) -> CryptoResult<SecureBytes>;

    fn get_info(&self, uid: u64) -> CryptoResult<StorageInfo>;

    /// Create or replace an entry
    fn set(&self, uid: u64, data: &[u8], flags: StorageFlags) -> CryptoResult<()>;

    fn remove(&self, uid: u64) -> CryptoResult<()>;

    /// Read a whole entry
    fn get_all(&self, uid: u64) -> CryptoResult<SecureBytes> {
        let info = self.get_info(uid)?;
        self.get(uid, 0, info.size)
    }

    fn exists(&self, uid: u64) -> CryptoResult<bool> {
        match self.get_info(uid) {
            Ok(_) => Ok(true),
            Err(CryptoError::DoesNotExist { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

fn missing(uid: u64) -> CryptoError {
    CryptoError::DoesNotExist {
        key_id: uid as u32,
    }
}

fn slice_entry(uid: u64, data: &[u8], offset: usize, length: usize) -> CryptoResult<SecureBytes> {
    let end = offset
        .checked_add(length)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| {
            CryptoError::invalid_argument(
                "offset/length",
                &format!("a range within the {} bytes of uid {:#x}", data.len(), uid),
                &format!("{}..{}", offset, offset.saturating_add(length)),
            )
        })?;
    Ok(SecureBytes::new(&data[offset..end]))
}

fn write_once_violation(uid: u64) -> CryptoError {
    CryptoError::not_permitted(
        "storage write",
        &format!("uid {:#x} is write-once", uid),
    )
}

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<u64, (SecureBytes, StorageFlags)>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyStorage for MemoryStorage {
    fn get(&self, uid: u64, offset: usize, length: usize) -> CryptoResult<SecureBytes> {
        let entries = self.entries.lock()?;
        let (data, _) = entries.get(&uid).ok_or_else(|| missing(uid))?;
        slice_entry(uid, data.as_bytes(), offset, length)
    }

    fn get_info(&self, uid: u64) -> CryptoResult<StorageInfo> {
        let entries = self.entries.lock()?;
        let (data, flags) = entries.get(&uid).ok_or_else(|| missing(uid))?;
        Ok(StorageInfo {
            size: data.len(),
            flags: *flags,
        })
    }

    fn set(&self, uid: u64, data: &[u8], flags: StorageFlags) -> CryptoResult<()> {
        let mut entries = self.entries.lock()?;
        if let Some((_, existing)) = entries.get(&uid) {
            if existing.contains(StorageFlags::WRITE_ONCE) {
                return Err(write_once_violation(uid));
            }
        }
        entries.insert(uid, (SecureBytes::new(data), flags));
        Ok(())
    }

    fn remove(&self, uid: u64) -> CryptoResult<()> {
        let mut entries = self.entries.lock()?;
        match entries.get(&uid) {
            None => Err(missing(uid)),
            Some((_, flags)) if flags.contains(StorageFlags::WRITE_ONCE) => {
                Err(write_once_violation(uid))
            }
            Some(_) => {
                entries.remove(&uid);
                Ok(())
            }
        }
    }
}

#[derive(Serialize, Deserialize)]
struct FileEntry {
    flags: StorageFlags,
    data: Vec<u8>,
}

impl Drop for FileEntry {
    fn drop(&mut self) {
        crate::utils::secure_zero(&mut self.data);
    }
}

/// Directory-backed storage: one file per uid
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Open (and create if needed) a storage directory
    pub fn open(root: impl AsRef<Path>) -> CryptoResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .map_err(|e| CryptoError::storage_failure("create storage directory", e))?;
        log::debug!("Using key storage directory {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, uid: u64) -> PathBuf {
        self.root.join(format!("{:016x}.psa", uid))
    }

    fn read_entry(&self, uid: u64) -> CryptoResult<FileEntry> {
        let path = self.path_for(uid);
        let raw = match fs::read(&path) {
            Ok(raw) => SecureBytes::from(raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(missing(uid)),
            Err(e) => return Err(CryptoError::storage_failure("read", e)),
        };
        bincode::deserialize(raw.as_bytes()).map_err(|e| CryptoError::DataCorrupt {
            uid,
            cause: e.to_string(),
        })
    }
}

impl KeyStorage for FileStorage {
    fn get(&self, uid: u64, offset: usize, length: usize) -> CryptoResult<SecureBytes> {
        let entry = self.read_entry(uid)?;
        slice_entry(uid, &entry.data, offset, length)
    }

    fn get_info(&self, uid: u64) -> CryptoResult<StorageInfo> {
        let entry = self.read_entry(uid)?;
        Ok(StorageInfo {
            size: entry.data.len(),
            flags: entry.flags,
        })
    }

    fn set(&self, uid: u64, data: &[u8], flags: StorageFlags) -> CryptoResult<()> {
        match self.read_entry(uid) {
            Ok(existing) if existing.flags.contains(StorageFlags::WRITE_ONCE) => {
                return Err(write_once_violation(uid));
            }
            Ok(_) | Err(CryptoError::DoesNotExist { .. }) => {}
            Err(e) => return Err(e),
        }

        let entry = FileEntry {
            flags,
            data: data.to_vec(),
        };
        let encoded = SecureBytes::from(bincode::serialize(&entry)?);

        // Write to a temporary file first so a crash never leaves a torn entry
        let path = self.path_for(uid);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, encoded.as_bytes()).map_err(|e| CryptoError::storage_failure("write", e))?;
        fs::rename(&tmp, &path).map_err(|e| CryptoError::storage_failure("rename", e))?;
        Ok(())
    }

    fn remove(&self, uid: u64) -> CryptoResult<()> {
        let entry = self.read_entry(uid)?;
        if entry.flags.contains(StorageFlags::WRITE_ONCE) {
            return Err(write_once_violation(uid));
        }
        fs::remove_file(self.path_for(uid)).map_err(|e| CryptoError::storage_failure("remove", e))
    }
}

#[cfg(test)]
mod tests;
