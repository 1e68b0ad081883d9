//! Idempotent units of work invoked by external background-job
//! infrastructure while no new mission is being ingested: retroactive
//! stat computation and historical data fixes.
//!
//! The scheduler, retry policy, and progress output are collaborator
//! concerns; a job only names the sorties still needing work (gated on the
//! [`crate::model::SortieAugmentation`] flags) and the per-sortie
//! computation. The two core methods have no default bodies, so an
//! unimplemented job is a compile error rather than a silent no-op.

use crate::aggregator::PassOptions;
use crate::data::{MissionContext, MissionLog};
use crate::model::{SortieId, TourId};
use crate::store::StatsStore;
use crate::{StatsEngine, StatsError};

/// A background job over sorties.
pub trait BackgroundJob<S: StatsStore, M: MissionContext> {
    /// Sorties from `tour_cutoff` onwards still needing this job's work.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn sorties_to_process(
        &self,
        engine: &StatsEngine<S, M>,
        tour_cutoff: TourId,
    ) -> anyhow::Result<Vec<SortieId>>;

    /// Run this job's computation for one sortie found by
    /// [`Self::sorties_to_process`].
    ///
    /// # Errors
    ///
    /// Returns an error if the computation cannot be applied.
    fn compute_for_sortie(
        &self,
        engine: &mut StatsEngine<S, M>,
        sortie: SortieId,
    ) -> anyhow::Result<()>;

    /// Progress line for the host's job runner output.
    fn log_update(&self, remaining: usize) -> String;

    /// Completion line for the host's job runner output.
    fn log_done(&self) -> String;

    /// Pre-pass run before any new sortie is processed. Data-fix jobs that
    /// must reset corrupted fields override this; the default does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the reset cannot be applied.
    fn reset_relevant_fields(&self, engine: &mut StatsEngine<S, M>) -> anyhow::Result<()> {
        let _ = engine;
        Ok(())
    }
}

fn sorties_missing<S, M, F>(
    engine: &StatsEngine<S, M>,
    tour_cutoff: TourId,
    mut done: F,
) -> anyhow::Result<Vec<SortieId>>
where
    S: StatsStore,
    M: MissionContext,
    F: FnMut(&crate::sortie::Sortie, &crate::model::SortieAugmentation) -> bool,
{
    let mut found = Vec::new();
    for sortie in engine.mission().sorties_since(tour_cutoff) {
        let processed = engine
            .store()
            .load_augmentation(sortie.id)?
            .is_some_and(|augmentation| done(sortie, &augmentation));
        if !processed {
            found.push(sortie.id);
        }
    }
    Ok(found)
}

/// Retroactively compute per-aircraft stats for sorties ingested before
/// the aircraft stats system existed: the full aggregation pass, at the
/// sortie level and, where a pilot flew, the pilot level.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecomputeAircraftStats;

impl<S: StatsStore, M: MissionContext> BackgroundJob<S, M> for RecomputeAircraftStats {
    fn sorties_to_process(
        &self,
        engine: &StatsEngine<S, M>,
        tour_cutoff: TourId,
    ) -> anyhow::Result<Vec<SortieId>> {
        sorties_missing(engine, tour_cutoff, |sortie, augmentation| {
            augmentation.sortie_stats_processed
                && (sortie.pilot.is_none() || augmentation.player_stats_processed)
        })
    }

    fn compute_for_sortie(
        &self,
        engine: &mut StatsEngine<S, M>,
        sortie: SortieId,
    ) -> anyhow::Result<()> {
        let pilot = engine
            .mission()
            .sortie(sortie)
            .ok_or(StatsError::UnknownSortie(sortie))?
            .pilot;
        engine.rebuild_sortie(sortie, None)?;
        if pilot.is_some() {
            engine.rebuild_sortie(sortie, pilot)?;
        }
        Ok(())
    }

    fn log_update(&self, remaining: usize) -> String {
        format!("aircraft stats recompute: {remaining} sorties left")
    }

    fn log_done(&self) -> String {
        "aircraft stats recompute done".to_string()
    }
}

/// Backfill the accident/AA loss-cause counters for sorties processed
/// before those fields existed.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackfillLossCauses;

impl<S: StatsStore, M: MissionContext> BackgroundJob<S, M> for BackfillLossCauses {
    fn sorties_to_process(
        &self,
        engine: &StatsEngine<S, M>,
        tour_cutoff: TourId,
    ) -> anyhow::Result<Vec<SortieId>> {
        sorties_missing(engine, tour_cutoff, |_, augmentation| {
            augmentation.fixed_aa_accident_stats
        })
    }

    fn compute_for_sortie(
        &self,
        engine: &mut StatsEngine<S, M>,
        sortie: SortieId,
    ) -> anyhow::Result<()> {
        engine.backfill_loss_causes(sortie)?;
        Ok(())
    }

    fn log_update(&self, remaining: usize) -> String {
        format!("AA/accident loss backfill: {remaining} sorties left")
    }

    fn log_done(&self) -> String {
        "AA/accident loss backfill done".to_string()
    }
}

/// Rebuild killboards for sorties processed while turret encounters were
/// double-counted. Runs the log-entry stage only, without touching primary
/// buckets or ratings; the host migration zeroes the affected killboard
/// slots before this job runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RebuildTurretKillboards;

impl<S: StatsStore, M: MissionContext> BackgroundJob<S, M> for RebuildTurretKillboards {
    fn sorties_to_process(
        &self,
        engine: &StatsEngine<S, M>,
        tour_cutoff: TourId,
    ) -> anyhow::Result<Vec<SortieId>> {
        sorties_missing(engine, tour_cutoff, |_, augmentation| {
            augmentation.fixed_doubled_turret_killboards
        })
    }

    fn compute_for_sortie(
        &self,
        engine: &mut StatsEngine<S, M>,
        sortie: SortieId,
    ) -> anyhow::Result<()> {
        let options = PassOptions {
            skip_primary_bucket: true,
            pure_killboard_stats_only: true,
            suppress_pilot_killboards: true,
        };
        engine.with_pass(sortie, options, |pass, flight| {
            pass.process_log_entries_for(flight, None)?;
            if flight.pilot.is_some() {
                pass.process_log_entries_for(flight, flight.pilot)?;
            }
            pass.augmentation_mut(flight.id)?.fixed_doubled_turret_killboards = true;
            Ok(())
        })?;
        Ok(())
    }

    fn log_update(&self, remaining: usize) -> String {
        format!("turret killboard rebuild: {remaining} sorties left")
    }

    fn log_done(&self) -> String {
        "turret killboard rebuild done".to_string()
    }
}

/// Drive one job to completion: reset pre-pass, then every pending sortie
/// in order, logging progress through the `log` facade.
///
/// # Errors
///
/// Returns the first error raised by the job.
pub fn run_job<S, M, J>(
    engine: &mut StatsEngine<S, M>,
    job: &J,
    tour_cutoff: TourId,
) -> anyhow::Result<usize>
where
    S: StatsStore,
    M: MissionContext,
    J: BackgroundJob<S, M>,
{
    job.reset_relevant_fields(engine)?;
    let pending = job.sorties_to_process(engine, tour_cutoff)?;
    let total = pending.len();
    log::info!("{}", job.log_update(total));
    for sortie in pending {
        job.compute_for_sortie(engine, sortie)?;
    }
    log::info!("{}", job.log_done());
    Ok(total)
}
