//! Persistence seam for the shared aggregate state.
//!
//! The engine never owns concurrency control. Implementations must make
//! individual loads and saves appear atomic per key, and callers must
//! serialize aggregation work per tour (or hold an exclusive lock per
//! bucket/killboard key touched by a pass): every pass performs
//! read-modify-write on state shared across sorties, and a pass either
//! fully commits or must be retried from scratch.

use std::collections::HashMap;
use std::convert::Infallible;

use crate::model::{
    Bucket, BucketId, BucketKey, Killboard, KillboardKey, SortieAugmentation, SortieId,
};

/// Store of buckets, killboards, and sortie augmentation flags.
pub trait StatsStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load a bucket by identity key.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store fails.
    fn load_bucket(&self, key: &BucketKey) -> Result<Option<Bucket>, Self::Error>;

    /// Load a killboard by normalized pair key.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store fails.
    fn load_killboard(&self, key: &KillboardKey) -> Result<Option<Killboard>, Self::Error>;

    /// Load the augmentation flags for a sortie.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store fails.
    fn load_augmentation(
        &self,
        sortie: SortieId,
    ) -> Result<Option<SortieAugmentation>, Self::Error>;

    /// Allocate a fresh, strictly increasing bucket id.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store fails.
    fn allocate_bucket_id(&mut self) -> Result<BucketId, Self::Error>;

    /// Persist a bucket (upsert).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store fails.
    fn save_bucket(&mut self, bucket: &Bucket) -> Result<(), Self::Error>;

    /// Persist a killboard (upsert).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store fails.
    fn save_killboard(&mut self, killboard: &Killboard) -> Result<(), Self::Error>;

    /// Persist a sortie's augmentation flags (upsert).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store fails.
    fn save_augmentation(&mut self, augmentation: &SortieAugmentation) -> Result<(), Self::Error>;
}

/// In-memory store. Reference implementation backing the test suites and
/// small single-process deployments.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    buckets: HashMap<BucketKey, Bucket>,
    killboards: HashMap<KillboardKey, Killboard>,
    augmentations: HashMap<SortieId, SortieAugmentation>,
    next_bucket_id: u64,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn bucket(&self, key: &BucketKey) -> Option<&Bucket> {
        self.buckets.get(key)
    }

    #[must_use]
    pub fn killboard(&self, key: &KillboardKey) -> Option<&Killboard> {
        self.killboards.get(key)
    }

    #[must_use]
    pub fn augmentation(&self, sortie: SortieId) -> Option<&SortieAugmentation> {
        self.augmentations.get(&sortie)
    }

    pub fn buckets(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.values()
    }

    pub fn killboards(&self) -> impl Iterator<Item = &Killboard> {
        self.killboards.values()
    }
}

impl StatsStore for MemoryStore {
    type Error = Infallible;

    fn load_bucket(&self, key: &BucketKey) -> Result<Option<Bucket>, Self::Error> {
        Ok(self.buckets.get(key).cloned())
    }

    fn load_killboard(&self, key: &KillboardKey) -> Result<Option<Killboard>, Self::Error> {
        Ok(self.killboards.get(key).cloned())
    }

    fn load_augmentation(
        &self,
        sortie: SortieId,
    ) -> Result<Option<SortieAugmentation>, Self::Error> {
        Ok(self.augmentations.get(&sortie).copied())
    }

    fn allocate_bucket_id(&mut self) -> Result<BucketId, Self::Error> {
        self.next_bucket_id += 1;
        Ok(BucketId(self.next_bucket_id))
    }

    fn save_bucket(&mut self, bucket: &Bucket) -> Result<(), Self::Error> {
        self.buckets.insert(bucket.key.clone(), bucket.clone());
        Ok(())
    }

    fn save_killboard(&mut self, killboard: &Killboard) -> Result<(), Self::Error> {
        self.killboards.insert(killboard.key, killboard.clone());
        Ok(())
    }

    fn save_augmentation(&mut self, augmentation: &SortieAugmentation) -> Result<(), Self::Error> {
        self.augmentations.insert(augmentation.sortie, *augmentation);
        Ok(())
    }
}
