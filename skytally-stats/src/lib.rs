//! Skytally Stats Engine
//!
//! Platform-agnostic aggregation of per-aircraft combat statistics from
//! flight-simulation mission logs. Every completed sortie folds into
//! running accumulators (buckets) keyed by airframe, optional pilot, and
//! variant filter; pairwise killboards and a zero-sum Elo-style rating are
//! maintained per air-to-air encounter, including gunner-turret credit
//! reconstructed from the victim's log.
//!
//! Persistence, mission ingestion, the object taxonomy, and job scheduling
//! live behind collaborator traits; this crate only computes.

pub mod aggregator;
pub mod attribution;
pub mod data;
pub mod encounters;
pub mod jobs;
pub mod killboard;
pub mod model;
pub mod rating;
pub mod registry;
pub mod sortie;
pub mod store;
pub mod streaks;
pub mod variants;

// Re-export commonly used types
pub use aggregator::{PassOptions, SortiePass};
pub use data::{
    ClassBase, MissionContext, MissionData, MissionLog, ObjectCatalog, ObjectSpec, PlayerDirectory,
};
pub use encounters::{EncounterPair, EncounterSets, TurretEncounters, turret_owner_aircraft};
pub use jobs::{
    BackfillLossCauses, BackgroundJob, RebuildTurretKillboards, RecomputeAircraftStats, run_job,
};
pub use killboard::EngagementFlags;
pub use model::{
    Bucket, BucketId, BucketKey, Coalition, Killboard, KillboardKey, KillboardSide, ObjectId,
    PilotId, SortieAugmentation, SortieId, TourId, VariantFilter,
};
pub use rating::{RATING_BASELINE, RATING_K, expected_score, rate_duel};
pub use registry::{BucketRegistry, KillboardRegistry};
pub use sortie::{
    AmmoBreakdown, AmmoUsage, EventKind, EventSide, Loadout, LogEntry, Sortie, SortieOutcome,
};
pub use store::{MemoryStore, StatsStore};
pub use variants::{classify_sortie, has_bomb_variant, has_boost_variant, has_recognized_variant};

use thiserror::Error;

/// Errors surfaced by the engine facade.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatsError {
    /// A referenced sortie was not found in the mission log.
    #[error("sortie {0:?} not present in the mission log")]
    UnknownSortie(SortieId),
}

/// Facade tying a persistence store and a mission context together.
///
/// One [`StatsEngine::process_sortie`] call is one atomic unit of work:
/// the pass-scoped registries are created, the sortie folds in, and every
/// touched record commits. Callers must serialize calls per tour (see
/// [`store::StatsStore`]) and gate on the [`SortieAugmentation`] flags;
/// the engine itself is intentionally not idempotent.
pub struct StatsEngine<S, M>
where
    S: StatsStore,
    M: MissionContext,
{
    store: S,
    mission: M,
}

impl<S, M> StatsEngine<S, M>
where
    S: StatsStore,
    M: MissionContext,
{
    /// Create an engine over the provided store and mission context.
    pub const fn new(store: S, mission: M) -> Self {
        Self { store, mission }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn mission(&self) -> &M {
        &self.mission
    }

    pub fn into_parts(self) -> (S, M) {
        (self.store, self.mission)
    }

    /// Fold one sortie into the aggregate state and commit.
    ///
    /// # Errors
    ///
    /// Returns the store's error if any load or save fails; the store is
    /// left untouched in that case.
    pub fn process_sortie(
        &mut self,
        sortie: &Sortie,
        pilot: Option<PilotId>,
    ) -> Result<(), S::Error> {
        let mut pass = SortiePass::new(&mut self.store, &self.mission);
        pass.process_sortie(sortie, pilot)?;
        pass.commit()
    }

    /// Process a sortie referenced by id, resolving it from the mission
    /// log first.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::UnknownSortie`] if the mission log has no such
    /// sortie, or the store's error if the pass fails.
    pub fn rebuild_sortie(&mut self, id: SortieId, pilot: Option<PilotId>) -> anyhow::Result<()> {
        let sortie = self
            .mission
            .sortie(id)
            .ok_or(StatsError::UnknownSortie(id))?
            .clone();
        self.process_sortie(&sortie, pilot)?;
        Ok(())
    }

    /// Apply only the loss-cause classification for a sortie and mark the
    /// corresponding fix flag. Used by the AA/accident backfill job.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::UnknownSortie`] if the mission log has no such
    /// sortie, or the store's error if the pass fails.
    pub fn backfill_loss_causes(&mut self, id: SortieId) -> anyhow::Result<()> {
        let sortie = self
            .mission
            .sortie(id)
            .ok_or(StatsError::UnknownSortie(id))?
            .clone();
        let mut pass = SortiePass::new(&mut self.store, &self.mission);
        pass.backfill_loss_causes(&sortie)?;
        pass.commit()?;
        Ok(())
    }

    /// Run a custom stage against one sortie inside a fresh pass and
    /// commit. Used by reprocessing jobs that need [`PassOptions`].
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::UnknownSortie`] if the mission log has no such
    /// sortie, or the store's error if the stage or commit fails.
    pub fn with_pass<F>(
        &mut self,
        sortie: SortieId,
        options: PassOptions,
        apply: F,
    ) -> anyhow::Result<()>
    where
        F: FnOnce(&mut SortiePass<'_, S, M>, &Sortie) -> Result<(), S::Error>,
    {
        let flight = self
            .mission
            .sortie(sortie)
            .ok_or(StatsError::UnknownSortie(sortie))?
            .clone();
        let mut pass = SortiePass::with_options(&mut self.store, &self.mission, options);
        apply(&mut pass, &flight)?;
        pass.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Coalition;

    fn fixture() -> (MemoryStore, MissionData) {
        let mut mission = MissionData::new();
        mission.insert_object(ObjectSpec::new(
            ObjectId(1),
            "MiG-3 ser.24",
            "aircraft_fighter",
            ClassBase::Aircraft,
        ));
        (MemoryStore::new(), mission)
    }

    #[test]
    fn engine_processes_and_persists_a_sortie() {
        let (store, mut mission) = fixture();
        let mut flight = Sortie::new(SortieId(1), TourId(1), ObjectId(1), Coalition(1));
        flight.ak_total = 2;
        mission.insert_sortie(flight.clone());

        let mut engine = StatsEngine::new(store, mission);
        engine.process_sortie(&flight, None).unwrap();

        let bucket = engine
            .store()
            .bucket(&BucketKey::base(TourId(1), ObjectId(1)))
            .expect("bucket persisted");
        assert_eq!(bucket.kills, 2);
        assert!(
            engine
                .store()
                .augmentation(SortieId(1))
                .unwrap()
                .sortie_stats_processed
        );
    }

    #[test]
    fn rebuild_by_id_fails_loudly_for_unknown_sorties() {
        let (store, mission) = fixture();
        let mut engine = StatsEngine::new(store, mission);
        let error = engine.rebuild_sortie(SortieId(99), None).unwrap_err();
        assert_eq!(
            error.downcast::<StatsError>().unwrap(),
            StatsError::UnknownSortie(SortieId(99))
        );
    }

    #[test]
    fn engine_parts_roundtrip() {
        let (store, mission) = fixture();
        let engine = StatsEngine::new(store, mission);
        let (store, mission) = engine.into_parts();
        assert_eq!(store.buckets().count(), 0);
        assert!(mission.object_by_name("MiG-3 ser.24").is_some());
    }
}
