/*!
 * Key Slot Store
 *
 * A fixed-capacity, process-wide table owning every loaded key. Each slot
 * is empty, reserved (being populated, invisible to lookups) or full. Full
 * slots carry a lock count; access goes through RAII guards so that every
 * exit path of a caller releases what it locked.
 *
 * # Locking
 *
 * A single mutex protects the table. It is held only while the table is
 * inspected or mutated. Storage I/O, builtin-key loading and driver calls
 * all happen with the mutex released: material is shared through an `Arc`
 * captured by the guard before the mutex is dropped.
 */

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::attributes::{KeyAttributes, KeyId, Lifetime};
use crate::error::{CryptoError, CryptoResult};
use crate::storage::{decode_key, encode_key, KeyStorage, StorageFlags};

mod builtin;
mod material;

pub use builtin::{
    BuiltinKeyEntry, BuiltinKeyTable, TEST_DRIVER_AES_KEY_SLOT, TEST_DRIVER_ED25519_KEY_SLOT,
};
pub use material::{KeyMaterial, OpaqueHandle};

/// Default number of key slots
pub const DEFAULT_SLOT_COUNT: usize = 32;

/// Loads the material of a builtin key from the driver that owns it
pub trait BuiltinKeyLoader: Send + Sync {
    fn load_builtin_key(
        &self,
        key_id: KeyId,
        lifetime: Lifetime,
        slot_number: u64,
    ) -> CryptoResult<(KeyAttributes, KeyMaterial)>;
}

#[derive(Debug)]
struct FullSlot {
    id: KeyId,
    attributes: KeyAttributes,
    material: Arc<KeyMaterial>,
    lock_count: u32,
}

#[derive(Debug)]
enum SlotState {
    Empty,
    /// Half-filled: creation in progress
    Reserved { id: KeyId },
    Full(FullSlot),
}

impl SlotState {
    fn id(&self) -> Option<KeyId> {
        match self {
            SlotState::Empty => None,
            SlotState::Reserved { id } => Some(*id),
            SlotState::Full(slot) => Some(slot.id),
        }
    }
}

/// Slot occupancy counters used to detect leaked keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotStats {
    pub volatile_slots: usize,
    pub persistent_slots: usize,
    pub external_slots: usize,
    pub half_filled_slots: usize,
    pub cache_slots: usize,
    pub empty_slots: usize,
    pub locked_slots: usize,
    pub max_open_internal_key_id: u32,
    pub max_open_external_key_id: u32,
}

impl SlotStats {
    /// Describe the first leak found, or `None` when nothing is held
    pub fn leak_message(&self) -> Option<&'static str> {
        if self.volatile_slots != 0 {
            return Some("A volatile slot has not been closed properly.");
        }
        if self.persistent_slots != 0 {
            return Some("A persistent slot has not been closed properly.");
        }
        if self.external_slots != 0 {
            return Some("An external slot has not been closed properly.");
        }
        if self.half_filled_slots != 0 {
            return Some("A half-filled slot has not been cleared properly.");
        }
        if self.locked_slots != 0 {
            return Some("Some slots are still marked as locked.");
        }
        None
    }
}

/// The key slot table
pub struct KeySlotStore {
    slots: Mutex<Vec<SlotState>>,
    storage: Arc<dyn KeyStorage>,
    builtin_keys: BuiltinKeyTable,
    loader: Option<Arc<dyn BuiltinKeyLoader>>,
}

impl fmt::Debug for KeySlotStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySlotStore")
            .field("capacity", &self.capacity())
            .field("builtin_keys", &self.builtin_keys.entries().len())
            .finish()
    }
}

impl KeySlotStore {
    /// Create a store with `slot_count` empty slots
    ///
    /// # Arguments
    ///
    /// * `slot_count` - Capacity of the table
    /// * `storage` - Backing store for persistent keys
    /// * `builtin_keys` - Reserved identifiers and where their material lives
    /// * `loader` - Driver access used to load builtin keys on first use
    pub fn new(
        slot_count: usize,
        storage: Arc<dyn KeyStorage>,
        builtin_keys: BuiltinKeyTable,
        loader: Option<Arc<dyn BuiltinKeyLoader>>,
    ) -> Self {
        let slots = (0..slot_count).map(|_| SlotState::Empty).collect();
        Self {
            slots: Mutex::new(slots),
            storage,
            builtin_keys,
            loader,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn storage(&self) -> &Arc<dyn KeyStorage> {
        &self.storage
    }

    pub fn builtin_keys(&self) -> &BuiltinKeyTable {
        &self.builtin_keys
    }

    fn table(&self) -> CryptoResult<MutexGuard<'_, Vec<SlotState>>> {
        Ok(self.slots.lock()?)
    }

    fn volatile_id(capacity: usize, index: usize) -> KeyId {
        KeyId(KeyId::VENDOR_MAX - capacity as u32 + 1 + index as u32)
    }

    fn volatile_index(capacity: usize, id: KeyId) -> Option<usize> {
        let first = KeyId::VENDOR_MAX - capacity as u32 + 1;
        if (first..=KeyId::VENDOR_MAX).contains(&id.0) {
            Some((id.0 - first) as usize)
        } else {
            None
        }
    }

    /// Find an empty slot, evicting an unlocked cached key if needed
    fn find_free(slots: &mut [SlotState]) -> Option<usize> {
        if let Some(index) = slots.iter().position(|s| matches!(s, SlotState::Empty)) {
            return Some(index);
        }
        let victim = slots.iter().position(|s| match s {
            SlotState::Full(slot) => slot.lock_count == 0 && !slot.attributes.lifetime().is_volatile(),
            _ => false,
        })?;
        if let SlotState::Full(slot) = &slots[victim] {
            log::warn!("Key slot table full, evicting cached key {}", slot.id);
        }
        slots[victim] = SlotState::Empty;
        Some(victim)
    }

    fn find_full(slots: &[SlotState], id: KeyId) -> Option<usize> {
        slots
            .iter()
            .position(|s| matches!(s, SlotState::Full(slot) if slot.id == id))
    }

    /// Reserve a slot for a key about to be created
    ///
    /// Nothing visible changes on failure. Persistent identifiers already
    /// present in the table or in storage yield `AlreadyExists`.
    pub fn reserve(self: &Arc<Self>, attributes: &KeyAttributes) -> CryptoResult<SlotReservation> {
        let lifetime = attributes.lifetime();
        let requested = attributes.id();
        if !lifetime.is_volatile() && self.storage.exists(requested.0 as u64)? {
            return Err(CryptoError::AlreadyExists { key_id: requested.0 });
        }

        let mut slots = self.table()?;
        if !lifetime.is_volatile() && slots.iter().any(|s| s.id() == Some(requested)) {
            return Err(CryptoError::AlreadyExists { key_id: requested.0 });
        }
        let index = Self::find_free(&mut slots).ok_or_else(|| CryptoError::InsufficientMemory {
            resource: format!("key slots ({} in use)", slots.len()),
        })?;
        let id = if lifetime.is_volatile() {
            Self::volatile_id(slots.len(), index)
        } else {
            requested
        };
        slots[index] = SlotState::Reserved { id };
        log::debug!("Reserved key slot {} for key {}", index, id);

        Ok(SlotReservation {
            store: Arc::clone(self),
            index,
            id,
            committed: false,
        })
    }

    /// Look up a key and lock it, loading it into the table if needed
    ///
    /// Reserved slots are never returned: a key still being created does
    /// not exist yet as far as lookups are concerned.
    pub fn acquire(self: &Arc<Self>, id: KeyId) -> CryptoResult<KeyGuard> {
        {
            let mut slots = self.table()?;
            if let Some(index) = Self::find_full(&slots, id) {
                return self.lock_slot(&mut slots, index);
            }
            if Self::volatile_index(slots.len(), id).is_some() {
                return Err(CryptoError::DoesNotExist { key_id: id.0 });
            }
            if slots.iter().any(|s| matches!(s, SlotState::Reserved { id: r } if *r == id)) {
                return Err(CryptoError::DoesNotExist { key_id: id.0 });
            }
        }

        let (attributes, material) = self.load(id)?;

        let mut slots = self.table()?;
        // Another thread may have loaded the key while the table was unlocked
        if let Some(index) = Self::find_full(&slots, id) {
            return self.lock_slot(&mut slots, index);
        }
        let index = Self::find_free(&mut slots).ok_or_else(|| CryptoError::InsufficientMemory {
            resource: format!("key slots ({} in use)", slots.len()),
        })?;
        slots[index] = SlotState::Full(FullSlot {
            id,
            attributes,
            material: Arc::new(material),
            lock_count: 0,
        });
        log::debug!("Loaded key {} into slot {}", id, index);
        self.lock_slot(&mut slots, index)
    }

    fn lock_slot(self: &Arc<Self>, slots: &mut [SlotState], index: usize) -> CryptoResult<KeyGuard> {
        match &mut slots[index] {
            SlotState::Full(slot) => {
                slot.lock_count += 1;
                Ok(KeyGuard {
                    store: Arc::clone(self),
                    index,
                    id: slot.id,
                    attributes: slot.attributes.clone(),
                    material: Arc::clone(&slot.material),
                    released: false,
                })
            }
            _ => Err(CryptoError::corruption(format!("slot {} is not full", index))),
        }
    }

    fn load(&self, id: KeyId) -> CryptoResult<(KeyAttributes, KeyMaterial)> {
        if id.is_builtin() {
            let (lifetime, slot_number) = self.builtin_keys.resolve(id)?;
            let loader = self
                .loader
                .as_ref()
                .ok_or(CryptoError::DoesNotExist { key_id: id.0 })?;
            let (mut attributes, material) = loader.load_builtin_key(id, lifetime, slot_number)?;
            attributes.set_lifetime(lifetime);
            attributes.set_id_raw(id);
            attributes.normalize();
            log::debug!("Loading builtin key {} from driver slot {}", id, slot_number);
            return Ok((attributes, material));
        }
        if id.is_user() {
            let data = self.storage.get_all(id.0 as u64)?;
            return decode_key(id.0 as u64, data.as_bytes());
        }
        Err(CryptoError::DoesNotExist { key_id: id.0 })
    }

    /// Decrement the lock count of the slot at `index`
    ///
    /// An underflow or a slot that no longer holds `id` means a guard
    /// outlived its slot, which is reported as `CorruptionDetected`.
    pub(crate) fn release(&self, index: usize, id: KeyId) -> CryptoResult<()> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        match slots.get_mut(index) {
            Some(SlotState::Full(slot)) if slot.id == id => {
                if slot.lock_count == 0 {
                    return Err(CryptoError::corruption(format!(
                        "lock count of key {} is already zero",
                        id
                    )));
                }
                slot.lock_count -= 1;
                Ok(())
            }
            _ => Err(CryptoError::corruption(format!(
                "released key {} is no longer in slot {}",
                id, index
            ))),
        }
    }

    /// Destroy the key held by `guard`
    ///
    /// Fails with `InUse` while any other guard holds the key and with
    /// `NotPermitted` for read-only keys; both leave the slot unchanged.
    /// On success the slot is empty, the backing storage of a persistent
    /// key has been deleted, and the material is handed back so the owning
    /// driver can release it. Raw material is wiped when the last reference
    /// is dropped.
    pub fn destroy(&self, mut guard: KeyGuard) -> CryptoResult<Arc<KeyMaterial>> {
        let lifetime = guard.attributes.lifetime();
        if lifetime.is_read_only() {
            return Err(CryptoError::not_permitted(
                "destroy key",
                "the key has a read-only lifetime",
            ));
        }

        {
            let mut slots = self.table()?;
            match slots.get_mut(guard.index) {
                Some(SlotState::Full(slot)) if slot.id == guard.id => {
                    if slot.lock_count > 1 {
                        return Err(CryptoError::InUse {
                            key_id: guard.id.0,
                            lock_count: slot.lock_count - 1,
                        });
                    }
                }
                _ => {
                    return Err(CryptoError::corruption(format!(
                        "key {} vanished from its slot",
                        guard.id
                    )))
                }
            }
            slots[guard.index] = SlotState::Empty;
            guard.released = true;
        }

        if !lifetime.is_volatile() {
            match self.storage.remove(guard.id.0 as u64) {
                Ok(()) | Err(CryptoError::DoesNotExist { .. }) => {}
                Err(e) => {
                    log::warn!("Key {} destroyed but its storage could not be removed: {}", guard.id, e);
                    return Err(e);
                }
            }
        }
        log::info!("Destroyed key {}", guard.id);
        Ok(Arc::clone(&guard.material))
    }

    /// Drop the cached copy of a persistent key, keeping its storage
    ///
    /// Volatile keys are left alone, and so is a key some operation still
    /// holds. A key that is not currently loaded reports `DoesNotExist`.
    pub fn purge(&self, id: KeyId) -> CryptoResult<()> {
        let mut slots = self.table()?;
        let index = Self::find_full(&slots, id).ok_or(CryptoError::DoesNotExist { key_id: id.0 })?;
        if let SlotState::Full(slot) = &slots[index] {
            if slot.attributes.lifetime().is_volatile() {
                return Ok(());
            }
            if slot.lock_count > 0 {
                log::debug!("Key {} is locked {} times, keeping it cached", id, slot.lock_count);
                return Ok(());
            }
        }
        slots[index] = SlotState::Empty;
        log::debug!("Purged cached key {} from slot {}", id, index);
        Ok(())
    }

    /// Snapshot of slot occupancy
    pub fn stats(&self) -> SlotStats {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stats = SlotStats::default();
        for state in slots.iter() {
            let slot = match state {
                SlotState::Empty => {
                    stats.empty_slots += 1;
                    continue;
                }
                SlotState::Reserved { .. } => {
                    stats.half_filled_slots += 1;
                    continue;
                }
                SlotState::Full(slot) => slot,
            };
            if slot.lock_count > 0 {
                stats.locked_slots += 1;
            }
            let lifetime = slot.attributes.lifetime();
            if lifetime.is_volatile() {
                stats.volatile_slots += 1;
            } else {
                stats.persistent_slots += 1;
                if slot.lock_count == 0 {
                    stats.cache_slots += 1;
                }
                stats.max_open_internal_key_id = stats.max_open_internal_key_id.max(slot.id.0);
            }
            if !lifetime.location.is_local() {
                stats.external_slots += 1;
                stats.max_open_external_key_id = stats.max_open_external_key_id.max(slot.id.0);
            }
        }
        stats
    }

    /// Empty every slot, as done at teardown
    ///
    /// Persistent keys survive in storage. Guards still alive afterwards
    /// report corruption when released.
    pub fn wipe_all(&self) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let locked = slots
            .iter()
            .filter(|s| matches!(s, SlotState::Full(slot) if slot.lock_count > 0))
            .count();
        if locked > 0 {
            log::warn!("Wiping key slots while {} are still locked", locked);
        }
        slots.iter_mut().for_each(|s| *s = SlotState::Empty);
    }
}

/// A reserved slot awaiting its key
///
/// Committing fills the slot; dropping an uncommitted reservation returns
/// the slot to empty, so a failed creation never leaves a half-filled slot.
pub struct SlotReservation {
    store: Arc<KeySlotStore>,
    index: usize,
    id: KeyId,
    committed: bool,
}

impl SlotReservation {
    /// Identifier the key will have
    pub fn id(&self) -> KeyId {
        self.id
    }

    /// Fill the slot, saving persistent keys to storage first
    pub fn commit(mut self, mut attributes: KeyAttributes, material: KeyMaterial) -> CryptoResult<KeyId> {
        attributes.normalize();
        attributes.set_id_raw(self.id);

        let lifetime = attributes.lifetime();
        if !lifetime.is_volatile() && !lifetime.is_read_only() {
            let encoded = encode_key(&attributes, &material)?;
            self.store
                .storage
                .set(self.id.0 as u64, encoded.as_bytes(), StorageFlags::empty())?;
        }

        {
            let mut slots = self.store.table()?;
            slots[self.index] = SlotState::Full(FullSlot {
                id: self.id,
                attributes,
                material: Arc::new(material),
                lock_count: 0,
            });
        }
        self.committed = true;
        log::info!("Created key {} in slot {}", self.id, self.index);
        Ok(self.id)
    }
}

impl Drop for SlotReservation {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let mut slots = self.store.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(&slots[self.index], SlotState::Reserved { id } if *id == self.id) {
            slots[self.index] = SlotState::Empty;
            log::warn!("Key creation for {} reverted, slot {} freed", self.id, self.index);
        }
    }
}

/// A locked key: attributes and material stay valid while the guard lives
///
/// Dropping the guard releases the lock.
pub struct KeyGuard {
    store: Arc<KeySlotStore>,
    index: usize,
    id: KeyId,
    attributes: KeyAttributes,
    material: Arc<KeyMaterial>,
    released: bool,
}

impl KeyGuard {
    pub fn id(&self) -> KeyId {
        self.id
    }

    pub fn attributes(&self) -> &KeyAttributes {
        &self.attributes
    }

    pub fn material(&self) -> &KeyMaterial {
        &self.material
    }

    /// Take a second lock on the same key, for cloned operations
    pub fn try_clone(&self) -> CryptoResult<KeyGuard> {
        let mut slots = self.store.table()?;
        match slots.get_mut(self.index) {
            Some(SlotState::Full(slot)) if slot.id == self.id => {
                slot.lock_count += 1;
                Ok(KeyGuard {
                    store: Arc::clone(&self.store),
                    index: self.index,
                    id: self.id,
                    attributes: self.attributes.clone(),
                    material: Arc::clone(&self.material),
                    released: false,
                })
            }
            _ => Err(CryptoError::corruption(format!(
                "locked key {} is no longer in slot {}",
                self.id, self.index
            ))),
        }
    }

    /// Release explicitly, surfacing a lock-count error
    pub fn release(mut self) -> CryptoResult<()> {
        self.released = true;
        self.store.release(self.index, self.id)
    }
}

impl fmt::Debug for KeyGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyGuard")
            .field("id", &self.id)
            .field("slot", &self.index)
            .finish()
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.store.release(self.index, self.id) {
            log::error!("Failed to release key {}: {}", self.id, e);
        }
    }
}

#[cfg(test)]
mod tests;
