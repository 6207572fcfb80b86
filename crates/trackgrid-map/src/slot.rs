use crate::chunk::ChunkKey;

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use trackgrid_core::SmallKeyHashMap;

type Slot<T> = Arc<Mutex<Option<T>>>;

/// A sparse map from [`ChunkKey`] to lazily created values.
///
/// The outer `RwLock` only guards the set of slots. Each slot has its own mutex, held while its value is created, so two
/// threads asking for the same missing key create it once while requests for other keys proceed.
pub struct SlotMap<T> {
    slots: RwLock<SmallKeyHashMap<ChunkKey, Slot<T>>>,
}

impl<T> Default for SlotMap<T> {
    fn default() -> Self {
        Self {
            slots: RwLock::new(SmallKeyHashMap::default()),
        }
    }
}

impl<T: Clone> SlotMap<T> {
    /// The value at `key`, if it has been created.
    pub fn get(&self, key: ChunkKey) -> Option<T> {
        let slot = self.slots.read().get(&key).cloned()?;
        let value = slot.lock().clone();
        value
    }

    /// Returns the value at `key`, creating it with `create` if necessary.
    ///
    /// A failed `create` leaves the slot empty, so the next caller tries again.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: ChunkKey,
        create: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        let slot = self.slot(key);
        let mut guard = slot.lock();
        if let Some(value) = guard.as_ref() {
            return Ok(value.clone());
        }
        let value = create()?;
        *guard = Some(value.clone());
        Ok(value)
    }

    /// The number of keys holding a value.
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .values()
            .filter(|slot| slot.lock().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, key: ChunkKey) -> Slot<T> {
        if let Some(slot) = self.slots.read().get(&key) {
            return slot.clone();
        }
        self.slots.write().entry(key).or_default().clone()
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn failed_creation_is_not_stored() {
        let map = SlotMap::<u32>::default();
        let key = ChunkKey::new(-10, -5);

        assert_eq!(map.get_or_try_insert_with(key, || Err("nope")), Err("nope"));
        assert_eq!(map.get(key), None);
        assert!(map.is_empty());

        assert_eq!(map.get_or_try_insert_with::<()>(key, || Ok(7)), Ok(7));
        assert_eq!(map.get_or_try_insert_with::<()>(key, || Ok(8)), Ok(7));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn concurrent_requests_create_once() {
        let map = SlotMap::<Arc<u32>>::default();
        let created = AtomicUsize::new(0);
        let key = ChunkKey::new(10, 5);

        crossbeam::scope(|s| {
            for _ in 0..8 {
                s.spawn(|_| {
                    let value = map
                        .get_or_try_insert_with::<()>(key, || {
                            created.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(10));
                            Ok(Arc::new(3))
                        })
                        .unwrap();
                    assert_eq!(*value, 3);
                });
            }
        })
        .unwrap();

        assert_eq!(created.load(Ordering::SeqCst), 1);
    }
}
