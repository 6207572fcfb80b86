use crate::error::GridResult;
use crate::projection::ProjectionKey;
use crate::store::GridStore;

use parking_lot::Mutex;
use std::hash::Hash;
use std::sync::Arc;
use trackgrid_core::SmallKeyHashMap;

/// Identifies the data a [`GridStore`] serves and the projection its world ranges are computed in. A store is only
/// reused while both are unchanged.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct StoreKey {
    pub dataset: String,
    pub projection: ProjectionKey,
}

type StoreFactory<K> = dyn Fn(&K) -> GridResult<GridStore> + Send + Sync;

/// Owns one [`GridStore`] per context, creating each on first request.
///
/// Dropping the registry (or calling [`GridRegistry::clear`]) releases the stores; callers still holding an
/// `Arc<GridStore>` keep theirs alive.
pub struct GridRegistry<K = StoreKey> {
    factory: Box<StoreFactory<K>>,
    stores: Mutex<SmallKeyHashMap<K, Arc<GridStore>>>,
}

impl<K> GridRegistry<K>
where
    K: Clone + Eq + Hash + std::fmt::Debug,
{
    pub fn new(factory: impl Fn(&K) -> GridResult<GridStore> + Send + Sync + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            stores: Mutex::new(SmallKeyHashMap::default()),
        }
    }

    /// The store for `context`, created with the factory if there is none yet. A failed creation is not remembered.
    pub fn store_for(&self, context: &K) -> GridResult<Arc<GridStore>> {
        let mut stores = self.stores.lock();
        if let Some(store) = stores.get(context) {
            return Ok(store.clone());
        }
        let store = Arc::new((self.factory)(context)?);
        log::info!("Created grid store for {:?}", context);
        stores.insert(context.clone(), store.clone());
        Ok(store)
    }

    pub fn remove(&self, context: &K) -> Option<Arc<GridStore>> {
        self.stores.lock().remove(context)
    }

    pub fn clear(&self) {
        self.stores.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.stores.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
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
    use crate::coordinates::GridCoordinates;
    use crate::error::GridError;
    use crate::loader::test::{Reply, ScriptedTransport};
    use crate::loader::ChunkLoader;
    use crate::projection::{ObliqueCylindrical, ViewProjection};

    use std::sync::atomic::{AtomicUsize, Ordering};
    use trackgrid_core::glam::{DVec2, DVec3};

    fn empty_store() -> GridStore {
        GridStore::new(
            GridCoordinates::new(DVec2::ZERO, DVec2::ONE),
            ChunkLoader::new(
                Arc::new(ScriptedTransport::new(vec![Reply::Missing])),
                &Default::default(),
            ),
            Arc::new(ObliqueCylindrical::default()),
        )
    }

    #[test]
    fn stores_are_created_once_per_context() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = created.clone();
        let registry = GridRegistry::new(move |_: &StoreKey| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(empty_store())
        });

        let geodetic = StoreKey {
            dataset: "tracks".to_owned(),
            projection: ObliqueCylindrical::default().cache_key(),
        };
        let tilted = StoreKey {
            projection: ObliqueCylindrical::new(DVec3::Y, DVec3::X)
                .unwrap()
                .cache_key(),
            ..geodetic.clone()
        };

        let a = registry.store_for(&geodetic).unwrap();
        let b = registry.store_for(&geodetic).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let c = registry.store_for(&tilted).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert_eq!(registry.len(), 2);

        assert!(registry.remove(&geodetic).is_some());
        let d = registry.store_for(&geodetic).unwrap();
        assert!(!Arc::ptr_eq(&a, &d));
        assert_eq!(created.load(Ordering::SeqCst), 3);

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn failed_creation_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let registry = GridRegistry::new(move |_: &u32| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(GridError::Config("first try".to_owned()))
            } else {
                Ok(empty_store())
            }
        });

        assert!(registry.store_for(&7).is_err());
        assert!(registry.is_empty());
        assert!(registry.store_for(&7).is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
