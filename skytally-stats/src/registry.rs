//! Pass-scoped get-or-create caches for buckets and killboards.
//!
//! The caches guarantee that repeated resolution of the same key within one
//! sortie's processing pass returns the same in-memory instance. Several
//! algorithm steps mutate the same bucket before it is persisted once, so
//! this is a correctness requirement, not an optimization. Registries must
//! not be reused across passes.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::model::{Bucket, BucketId, BucketKey, Killboard, KillboardKey, TourId};
use crate::store::StatsStore;

/// Bucket resolution cache for one processing pass.
#[derive(Debug, Default)]
pub struct BucketRegistry {
    cache: HashMap<BucketKey, Bucket>,
}

impl BucketRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get-or-create the bucket for `key`, loading from the store on first
    /// reference and allocating a fresh bucket on a store miss.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the load or id allocation fails.
    pub fn resolve<S: StatsStore>(
        &mut self,
        store: &mut S,
        key: &BucketKey,
    ) -> Result<&mut Bucket, S::Error> {
        match self.cache.entry(key.clone()) {
            Entry::Occupied(slot) => Ok(slot.into_mut()),
            Entry::Vacant(slot) => {
                let bucket = match store.load_bucket(key)? {
                    Some(existing) => existing,
                    None => Bucket::new(store.allocate_bucket_id()?, key.clone()),
                };
                Ok(slot.insert(bucket))
            }
        }
    }

    /// Resolve and return just the bucket id.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the load or id allocation fails.
    pub fn resolve_id<S: StatsStore>(
        &mut self,
        store: &mut S,
        key: &BucketKey,
    ) -> Result<BucketId, S::Error> {
        Ok(self.resolve(store, key)?.id)
    }

    /// Already-resolved bucket, if any.
    #[must_use]
    pub fn cached(&self, key: &BucketKey) -> Option<&Bucket> {
        self.cache.get(key)
    }

    /// Already-resolved bucket, if any.
    #[must_use]
    pub fn cached_mut(&mut self, key: &BucketKey) -> Option<&mut Bucket> {
        self.cache.get_mut(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Consume the registry, yielding every touched bucket for persistence.
    pub fn into_buckets(self) -> impl Iterator<Item = Bucket> {
        self.cache.into_values()
    }
}

/// Killboard resolution cache for one processing pass.
#[derive(Debug, Default)]
pub struct KillboardRegistry {
    cache: HashMap<KillboardKey, Killboard>,
}

impl KillboardRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get-or-create the killboard between two buckets. The pair key is
    /// normalized by ascending bucket id, so resolution order between the
    /// two sides never matters.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the load fails.
    pub fn resolve<S: StatsStore>(
        &mut self,
        store: &mut S,
        tour: TourId,
        a: BucketId,
        b: BucketId,
    ) -> Result<&mut Killboard, S::Error> {
        let key = KillboardKey::paired(tour, a, b);
        match self.cache.entry(key) {
            Entry::Occupied(slot) => Ok(slot.into_mut()),
            Entry::Vacant(slot) => {
                let killboard = match store.load_killboard(&key)? {
                    Some(existing) => existing,
                    None => Killboard::new(key),
                };
                Ok(slot.insert(killboard))
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Consume the registry, yielding every touched killboard for
    /// persistence.
    pub fn into_killboards(self) -> impl Iterator<Item = Killboard> {
        self.cache.into_values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ObjectId, VariantFilter};
    use crate::store::MemoryStore;

    fn key(aircraft: u32) -> BucketKey {
        BucketKey::base(TourId(1), ObjectId(aircraft))
    }

    #[test]
    fn resolve_returns_the_same_instance_within_a_pass() {
        let mut store = MemoryStore::new();
        let mut registry = BucketRegistry::new();

        let id = registry.resolve(&mut store, &key(1)).unwrap().id;
        registry.resolve(&mut store, &key(1)).unwrap().kills += 1;
        let again = registry.resolve(&mut store, &key(1)).unwrap();
        assert_eq!(again.id, id);
        assert_eq!(again.kills, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn resolve_loads_persisted_state() {
        let mut store = MemoryStore::new();
        {
            let mut registry = BucketRegistry::new();
            registry.resolve(&mut store, &key(1)).unwrap().kills = 5;
            for bucket in registry.into_buckets() {
                store.save_bucket(&bucket).unwrap();
            }
        }
        let mut registry = BucketRegistry::new();
        assert_eq!(registry.resolve(&mut store, &key(1)).unwrap().kills, 5);
    }

    #[test]
    fn distinct_filters_resolve_distinct_buckets() {
        let mut store = MemoryStore::new();
        let mut registry = BucketRegistry::new();
        let base = registry.resolve_id(&mut store, &key(1)).unwrap();
        let filtered = registry
            .resolve_id(&mut store, &key(1).with_filter(VariantFilter::Bombs))
            .unwrap();
        assert_ne!(base, filtered);
    }

    #[test]
    fn killboard_resolution_is_order_independent() {
        let mut store = MemoryStore::new();
        let mut registry = KillboardRegistry::new();
        let first = registry
            .resolve(&mut store, TourId(1), BucketId(2), BucketId(9))
            .unwrap()
            .key;
        let second = registry
            .resolve(&mut store, TourId(1), BucketId(9), BucketId(2))
            .unwrap()
            .key;
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
    }
}
