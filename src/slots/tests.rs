use super::*;
use crate::algorithm::Algorithm;
use crate::attributes::{KeyType, KeyUsage, Location};
use crate::secure_memory::SecureBytes;
use crate::storage::MemoryStorage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

struct CountingLoader {
    loads: AtomicUsize,
}

impl BuiltinKeyLoader for CountingLoader {
    fn load_builtin_key(
        &self,
        _key_id: KeyId,
        lifetime: Lifetime,
        slot_number: u64,
    ) -> CryptoResult<(KeyAttributes, KeyMaterial)> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let attrs = KeyAttributes::new()
            .with_type(KeyType::Aes)
            .with_bits(128)
            .with_usage(KeyUsage::ENCRYPT);
        Ok((
            attrs,
            KeyMaterial::Opaque(OpaqueHandle {
                location: lifetime.location,
                slot_number,
            }),
        ))
    }
}

fn new_store(slot_count: usize) -> (Arc<KeySlotStore>, Arc<MemoryStorage>, Arc<CountingLoader>) {
    let storage = Arc::new(MemoryStorage::new());
    let loader = Arc::new(CountingLoader {
        loads: AtomicUsize::new(0),
    });
    let store = Arc::new(KeySlotStore::new(
        slot_count,
        storage.clone(),
        BuiltinKeyTable::test_platform(),
        Some(loader.clone()),
    ));
    (store, storage, loader)
}

fn aes_attributes() -> KeyAttributes {
    KeyAttributes::new()
        .with_type(KeyType::Aes)
        .with_bits(128)
        .with_usage(KeyUsage::ENCRYPT | KeyUsage::DECRYPT)
        .with_algorithm(Algorithm::Ctr)
}

fn raw(bytes: &[u8]) -> KeyMaterial {
    KeyMaterial::Raw(SecureBytes::new(bytes))
}

fn create(store: &Arc<KeySlotStore>, attrs: &KeyAttributes) -> KeyId {
    let reservation = store.reserve(attrs).unwrap();
    reservation.commit(attrs.clone(), raw(&[7u8; 16])).unwrap()
}

#[test]
fn test_create_and_destroy_returns_to_baseline() {
    let (store, _, _) = new_store(4);
    let baseline = store.stats();
    assert_eq!(baseline.empty_slots, 4);
    assert_eq!(baseline.leak_message(), None);

    // Step 1: create a volatile key; it gets an id from the volatile range
    let id = create(&store, &aes_attributes());
    assert!(id.is_vendor());
    assert_eq!(store.stats().volatile_slots, 1);
    assert_eq!(
        store.stats().leak_message(),
        Some("A volatile slot has not been closed properly.")
    );

    // Step 2: destroy through a guard
    let guard = store.acquire(id).unwrap();
    assert_eq!(guard.attributes().id(), id);
    store.destroy(guard).unwrap();
    assert_eq!(store.stats(), baseline);

    // Step 3: the id no longer resolves
    assert!(matches!(
        store.acquire(id),
        Err(CryptoError::DoesNotExist { .. })
    ));
}

#[test]
fn test_destroy_locked_key_is_in_use() {
    let (store, _, _) = new_store(4);
    let id = create(&store, &aes_attributes());

    let held = store.acquire(id).unwrap();
    let second = store.acquire(id).unwrap();
    assert_eq!(store.stats().locked_slots, 1);

    // Another holder exists: destroy is refused and nothing changes
    let err = store.destroy(second).unwrap_err();
    assert!(matches!(err, CryptoError::InUse { lock_count: 1, .. }));
    assert_eq!(store.stats().volatile_slots, 1);
    assert_eq!(store.stats().locked_slots, 1);

    // Once the other holder releases, destroy succeeds
    held.release().unwrap();
    assert_eq!(store.stats().locked_slots, 0);
    let guard = store.acquire(id).unwrap();
    store.destroy(guard).unwrap();
    assert_eq!(store.stats().leak_message(), None);
}

#[test]
fn test_release_underflow_is_corruption() {
    let (store, _, _) = new_store(2);
    let id = create(&store, &aes_attributes());
    let guard = store.acquire(id).unwrap();
    let index = guard.index;
    guard.release().unwrap();

    let err = store.release(index, id).unwrap_err();
    assert!(matches!(err, CryptoError::CorruptionDetected { .. }));
}

#[test]
fn test_dropped_reservation_leaves_slot_empty() {
    let (store, _, _) = new_store(2);
    {
        let reservation = store.reserve(&aes_attributes()).unwrap();
        let stats = store.stats();
        assert_eq!(stats.half_filled_slots, 1);
        assert_eq!(
            stats.leak_message(),
            Some("A half-filled slot has not been cleared properly.")
        );
        // Reserved slots are invisible to lookups
        assert!(matches!(
            store.acquire(reservation.id()),
            Err(CryptoError::DoesNotExist { .. })
        ));
    }
    assert_eq!(store.stats().half_filled_slots, 0);
    assert_eq!(store.stats().empty_slots, 2);
}

#[test]
fn test_table_full() {
    let (store, _, _) = new_store(2);
    let a = create(&store, &aes_attributes());
    let b = create(&store, &aes_attributes());
    assert_ne!(a, b);

    let err = store.reserve(&aes_attributes()).err().unwrap();
    assert!(matches!(err, CryptoError::InsufficientMemory { .. }));
    assert!(err.is_retryable());

    store.wipe_all();
    assert_eq!(store.stats().empty_slots, 2);
}

#[test]
fn test_persistent_key_purge_and_reload() {
    let (store, storage, _) = new_store(4);
    let attrs = aes_attributes().with_id(12u32);

    // Step 1: creating a persistent key writes it to storage
    let id = create(&store, &attrs);
    assert_eq!(id, KeyId(12));
    assert!(storage.exists(12).unwrap());

    // Step 2: the same id cannot be created twice
    assert!(matches!(
        store.reserve(&attrs).err().unwrap(),
        CryptoError::AlreadyExists { key_id: 12 }
    ));

    // Step 3: purge drops the cached copy only
    store.purge(id).unwrap();
    assert_eq!(store.stats().persistent_slots, 0);
    assert!(storage.exists(12).unwrap());

    // Step 4: a lookup reloads identical attributes and material
    let guard = store.acquire(id).unwrap();
    assert_eq!(guard.attributes().lifetime(), Lifetime::PERSISTENT);
    assert_eq!(guard.attributes().key_type(), KeyType::Aes);
    assert_eq!(guard.material().raw().unwrap(), &[7u8; 16]);

    // Step 5: destroy removes the storage entry
    store.destroy(guard).unwrap();
    assert!(!storage.exists(12).unwrap());
}

#[test]
fn test_purge_leaves_locked_key_cached() {
    let (store, _, _) = new_store(4);
    let id = create(&store, &aes_attributes().with_id(3u32));
    let guard = store.acquire(id).unwrap();
    store.purge(id).unwrap();
    assert_eq!(store.stats().persistent_slots, 1);
    assert_eq!(store.stats().locked_slots, 1);
    assert_eq!(guard.attributes().id(), id);
    drop(guard);
    store.purge(id).unwrap();
    assert!(matches!(store.purge(id), Err(CryptoError::DoesNotExist { .. })));
}

#[test]
fn test_cached_persistent_key_is_evicted_when_full() {
    let (store, storage, _) = new_store(2);
    let persistent = create(&store, &aes_attributes().with_id(1u32));
    let _volatile = create(&store, &aes_attributes());

    // The unlocked persistent slot makes room for a new volatile key
    let third = create(&store, &aes_attributes());
    assert!(third.is_vendor());
    assert_eq!(store.stats().persistent_slots, 0);
    assert!(storage.exists(1).unwrap());

    // Volatile keys are never evicted
    let err = store.acquire(persistent).unwrap_err();
    assert!(matches!(err, CryptoError::InsufficientMemory { .. }));
}

#[test]
fn test_builtin_keys_resolve_and_cache() {
    let (store, _, loader) = new_store(4);

    // Out of every configured range
    assert!(matches!(
        store.acquire(KeyId(KeyId::BUILTIN_MIN + 2)),
        Err(CryptoError::DoesNotExist { .. })
    ));
    // Listed in the table but outside the builtin range: never consulted
    assert!(matches!(
        store.acquire(KeyId(KeyId::BUILTIN_MIN - 1)),
        Err(CryptoError::DoesNotExist { .. })
    ));

    let guard = store.acquire(KeyId(KeyId::BUILTIN_MIN)).unwrap();
    let lifetime = guard.attributes().lifetime();
    assert!(lifetime.is_read_only());
    assert_eq!(lifetime.location, Location::TEST_DRIVER);
    assert_eq!(
        guard.material().opaque().unwrap().slot_number,
        TEST_DRIVER_AES_KEY_SLOT
    );
    assert_eq!(store.stats().external_slots, 1);

    // Read-only keys cannot be destroyed
    assert!(matches!(
        store.destroy(guard),
        Err(CryptoError::NotPermitted { .. })
    ));
    assert_eq!(store.stats().locked_slots, 0);

    // Cached: a second lookup does not go back to the driver
    let again = store.acquire(KeyId(KeyId::BUILTIN_MIN)).unwrap();
    drop(again);
    assert_eq!(loader.loads.load(Ordering::SeqCst), 1);

    store.purge(KeyId(KeyId::BUILTIN_MIN)).unwrap();
    assert_eq!(store.stats().leak_message(), None);
}

#[test]
fn test_builtin_table_first_match_is_stable() {
    let table = BuiltinKeyTable::test_platform();
    let first = table.resolve(KeyId(KeyId::BUILTIN_MAX)).unwrap();
    let second = table.resolve(KeyId(KeyId::BUILTIN_MAX)).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.1, TEST_DRIVER_AES_KEY_SLOT);
    assert_eq!(
        table.resolve(KeyId(KeyId::BUILTIN_MIN + 1)).unwrap().1,
        TEST_DRIVER_ED25519_KEY_SLOT
    );
    assert!(table.resolve(KeyId(5)).is_err());
}

#[test]
fn test_concurrent_lookups_balance_lock_counts() {
    let (store, _, _) = new_store(8);
    let id = create(&store, &aes_attributes());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..100 {
                    let guard = store.acquire(id).unwrap();
                    assert_eq!(guard.material().raw().unwrap().len(), 16);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.stats().locked_slots, 0);
    let guard = store.acquire(id).unwrap();
    store.destroy(guard).unwrap();
}
