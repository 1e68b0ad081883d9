//! Top-level per-sortie aggregation pass.
//!
//! A [`SortiePass`] owns the pass-scoped registries and nothing persists
//! until [`SortiePass::commit`]: the pass either fully applies or leaves
//! the store untouched. The pass itself is intentionally not idempotent;
//! callers gate on the [`SortieAugmentation`] flags before invoking it.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::attribution;
use crate::data::{MissionContext, MissionLog, ObjectCatalog};
use crate::encounters::{self, EncounterPair, EncounterSets};
use crate::killboard::{EngagementFlags, update_from_entries};
use crate::model::{Bucket, BucketKey, PilotId, SortieAugmentation, SortieId, VariantFilter};
use crate::registry::{BucketRegistry, KillboardRegistry};
use crate::sortie::Sortie;
use crate::store::StatsStore;
use crate::streaks;
use crate::variants::{classify_sortie, has_recognized_variant};

/// Switches used by reprocessing jobs. A regular aggregation pass runs
/// with the default (everything on).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassOptions {
    /// Rebuild killboards without re-crediting the primary bucket.
    pub skip_primary_bucket: bool,
    /// Restrict the pass to killboard bookkeeping: no loss-cause or
    /// ammunition attribution.
    pub pure_killboard_stats_only: bool,
    /// Never expand pilot-scoped killboard keys.
    pub suppress_pilot_killboards: bool,
}

struct BucketPlan {
    has_subtype: bool,
    subtype_filter: Option<VariantFilter>,
}

/// One sortie's aggregation unit of work.
pub struct SortiePass<'a, S: StatsStore, M: MissionContext> {
    store: &'a mut S,
    mission: &'a M,
    options: PassOptions,
    buckets: BucketRegistry,
    killboards: KillboardRegistry,
    augmentations: HashMap<SortieId, SortieAugmentation>,
}

impl<'a, S: StatsStore, M: MissionContext> SortiePass<'a, S, M> {
    pub fn new(store: &'a mut S, mission: &'a M) -> Self {
        Self::with_options(store, mission, PassOptions::default())
    }

    pub fn with_options(store: &'a mut S, mission: &'a M, options: PassOptions) -> Self {
        Self {
            store,
            mission,
            options,
            buckets: BucketRegistry::new(),
            killboards: KillboardRegistry::new(),
            augmentations: HashMap::new(),
        }
    }

    /// Fold one sortie into its buckets, killboards, and ratings.
    ///
    /// `pilot` selects the pilot-scoped buckets; `None` updates the
    /// pilot-less aggregates. Non-aircraft sorties are a no-op. An airframe
    /// with recognized variants is processed twice: the aggregate pass and
    /// a subtype pass under the sortie's own classification.
    ///
    /// # Errors
    ///
    /// Returns the store's error if a load or id allocation fails.
    pub fn process_sortie(
        &mut self,
        sortie: &Sortie,
        pilot: Option<PilotId>,
    ) -> Result<(), S::Error> {
        let Some(plan) = self.bucket_plan(sortie) else {
            return Ok(());
        };
        let base_key = BucketKey {
            tour: sortie.tour,
            aircraft: sortie.aircraft,
            filter: VariantFilter::NoFilter,
            pilot,
        };
        self.process_bucket(&base_key, sortie, plan.has_subtype, false)?;
        if let Some(filter) = plan.subtype_filter {
            self.process_bucket(&base_key.with_filter(filter), sortie, true, true)?;
        }

        let augmentation = self.augmentation_mut(sortie.id)?;
        if pilot.is_none() {
            augmentation.sortie_stats_processed = true;
        } else {
            augmentation.player_stats_processed = true;
        }
        augmentation.fixed_aa_accident_stats = true;
        augmentation.fixed_doubled_turret_killboards = true;
        augmentation.added_player_kb_losses = true;
        Ok(())
    }

    /// Run only the log-entry stage (encounters, killboards, attribution)
    /// for a sortie. Entry point for reprocessing jobs, combined with
    /// [`PassOptions`].
    ///
    /// # Errors
    ///
    /// Returns the store's error if a load or id allocation fails.
    pub fn process_log_entries_for(
        &mut self,
        sortie: &Sortie,
        pilot: Option<PilotId>,
    ) -> Result<(), S::Error> {
        let Some(plan) = self.bucket_plan(sortie) else {
            return Ok(());
        };
        let base_key = BucketKey {
            tour: sortie.tour,
            aircraft: sortie.aircraft,
            filter: VariantFilter::NoFilter,
            pilot,
        };
        self.process_log_entries(&base_key, sortie, plan.has_subtype, false)?;
        if let Some(filter) = plan.subtype_filter {
            self.process_log_entries(&base_key.with_filter(filter), sortie, true, true)?;
        }
        Ok(())
    }

    /// Apply only the loss-cause classification (accident/AA) for a sortie
    /// to its pilot-less buckets and mark the fix flag. Stage used by the
    /// backfill job for sorties processed before those counters existed.
    ///
    /// # Errors
    ///
    /// Returns the store's error if a load or id allocation fails.
    pub fn backfill_loss_causes(&mut self, sortie: &Sortie) -> Result<(), S::Error> {
        let Some(plan) = self.bucket_plan(sortie) else {
            return Ok(());
        };
        let base_key = BucketKey::base(sortie.tour, sortie.aircraft);
        let bucket = self.buckets.resolve(self.store, &base_key)?;
        attribution::process_aa_accident_death(self.mission, bucket, sortie);
        if let Some(filter) = plan.subtype_filter {
            let filtered = self.buckets.resolve(self.store, &base_key.with_filter(filter))?;
            attribution::process_aa_accident_death(self.mission, filtered, sortie);
        }
        self.augmentation_mut(sortie.id)?.fixed_aa_accident_stats = true;
        Ok(())
    }

    /// The augmentation record for a sortie, loaded once per pass.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the load fails.
    pub fn augmentation_mut(
        &mut self,
        sortie: SortieId,
    ) -> Result<&mut SortieAugmentation, S::Error> {
        match self.augmentations.entry(sortie) {
            Entry::Occupied(slot) => Ok(slot.into_mut()),
            Entry::Vacant(slot) => {
                let augmentation = self
                    .store
                    .load_augmentation(sortie)?
                    .unwrap_or_else(|| SortieAugmentation::new(sortie));
                Ok(slot.insert(augmentation))
            }
        }
    }

    /// Persist every touched record. Derived rates are recomputed on the
    /// way out; touched killboards get their data-fix markers set.
    ///
    /// # Errors
    ///
    /// Returns the store's error if a save fails.
    pub fn commit(self) -> Result<(), S::Error> {
        let Self {
            store,
            buckets,
            killboards,
            augmentations,
            ..
        } = self;
        for mut bucket in buckets.into_buckets() {
            bucket.recompute_derived();
            store.save_bucket(&bucket)?;
        }
        for mut killboard in killboards.into_killboards() {
            killboard.turret_double_count_fixed = true;
            killboard.pilot_loss_backfilled = true;
            store.save_killboard(&killboard)?;
        }
        for augmentation in augmentations.values() {
            store.save_augmentation(augmentation)?;
        }
        Ok(())
    }

    fn bucket_plan(&self, sortie: &Sortie) -> Option<BucketPlan> {
        let Some(spec) = self.mission.object(sortie.aircraft) else {
            log::warn!("sortie {:?} references unknown aircraft {:?}", sortie.id, sortie.aircraft);
            return None;
        };
        if !spec.is_aircraft() {
            return None;
        }
        let has_subtype = has_recognized_variant(&spec.name);
        let subtype_filter = has_subtype.then(|| classify_sortie(sortie, spec));
        Some(BucketPlan {
            has_subtype,
            subtype_filter,
        })
    }

    fn process_bucket(
        &mut self,
        key: &BucketKey,
        sortie: &Sortie,
        has_subtype: bool,
        is_subtype: bool,
    ) -> Result<(), S::Error> {
        accumulate_sortie(self.buckets.resolve(self.store, key)?, sortie);
        if key.pilot.is_some() {
            streaks::process_streaks_and_bests(self.store, &mut self.buckets, key, sortie)?;
        }
        self.process_log_entries(key, sortie, has_subtype, is_subtype)
    }

    fn process_log_entries(
        &mut self,
        key: &BucketKey,
        sortie: &Sortie,
        has_subtype: bool,
        is_subtype: bool,
    ) -> Result<(), S::Error> {
        let sets = encounters::resolve_main_encounters(self.mission, sortie);
        let flags = EngagementFlags {
            has_subtype,
            is_subtype,
            use_pilot_kbs: key.pilot.is_none() && !self.options.suppress_pilot_killboards,
            update_primary: !self.options.skip_primary_bucket,
        };
        update_from_entries(
            self.store,
            self.mission,
            &mut self.buckets,
            &mut self.killboards,
            key,
            &sets,
            flags,
        )?;

        if !self.options.pure_killboard_stats_only {
            if let Some(bucket) = self.buckets.cached_mut(key) {
                attribution::process_aa_accident_death(self.mission, bucket, sortie);
            }
            if sortie.ammo.breakdown.is_some() {
                attribution::process_ammo_breakdown(
                    self.store,
                    self.mission,
                    &mut self.buckets,
                    key,
                    sortie,
                    is_subtype,
                )?;
            }
        }

        // Turret credit is rebuilt from the victim's perspective. Subtype
        // passes skip it: the turret owner's variant cannot be determined
        // from the victim's log (the turreted Halberstadt with its
        // fighter-bomber variant is the known gap).
        if is_subtype {
            return Ok(());
        }
        let turret_hits = encounters::resolve_turret_encounters(self.mission, sortie);
        if turret_hits.is_empty() {
            return Ok(());
        }

        let victim = EncounterPair {
            aircraft: sortie.aircraft,
            sortie: sortie.id,
        };
        let turret_flags = EngagementFlags {
            has_subtype: false,
            is_subtype: false,
            use_pilot_kbs: key.pilot.is_some() && !self.options.suppress_pilot_killboards,
            update_primary: key.pilot.is_none() && !self.options.skip_primary_bucket,
        };
        for turret_name in turret_hits.names() {
            let Some(owner) = encounters::turret_owner_spec(self.mission, turret_name) else {
                continue;
            };
            let owner_key = BucketKey::base(key.tour, owner.id);
            let turret_sets = EncounterSets::single(
                victim,
                turret_hits.damaged.contains(turret_name),
                turret_hits.shotdown.contains(turret_name),
                turret_hits.killed.contains(turret_name),
            );
            update_from_entries(
                self.store,
                self.mission,
                &mut self.buckets,
                &mut self.killboards,
                &owner_key,
                &turret_sets,
                turret_flags,
            )?;
        }
        Ok(())
    }
}

fn accumulate_sortie(bucket: &mut Bucket, sortie: &Sortie) {
    if !sortie.outcome.not_takeoff {
        bucket.total_sorties += 1;
        bucket.total_flight_time += sortie.flight_time;
    }
    bucket.kills += sortie.ak_total;
    bucket.ground_kills += sortie.gk_total;
    bucket.assists += sortie.ak_assist;
    bucket.score += sortie.score;
    bucket.aircraft_lost += u32::from(sortie.outcome.lost_aircraft);
    bucket.deaths += u32::from(sortie.outcome.dead);
    bucket.captures += u32::from(sortie.outcome.captured);
    bucket.bailouts += u32::from(sortie.outcome.bailout);
    bucket.ditches += u32::from(sortie.outcome.ditched);
    bucket.landings += u32::from(sortie.outcome.landed);
    bucket.in_flight += u32::from(sortie.outcome.in_flight);
    bucket.crashes += u32::from(sortie.outcome.crashed);
    bucket.shotdown += u32::from(sortie.outcome.shotdown);
    bucket.coalition = Some(sortie.coalition);

    if sortie.ammo.used_cartridges > 0 {
        bucket.ammo_shot += sortie.ammo.used_cartridges;
    }
    if sortie.ammo.hit_bullets > 0 {
        bucket.ammo_hit += sortie.ammo.hit_bullets;
    }
    if sortie.ammo.used_bombs > 0 {
        bucket.bomb_rocket_shot += sortie.ammo.used_bombs;
    }
    if sortie.ammo.hit_bombs > 0 {
        bucket.bomb_rocket_hit += sortie.ammo.hit_bombs;
    }
    if sortie.ammo.used_rockets > 0 {
        bucket.bomb_rocket_shot += sortie.ammo.used_rockets;
    }
    if sortie.ammo.hit_rockets > 0 {
        bucket.bomb_rocket_hit += sortie.ammo.hit_rockets;
    }

    if sortie.took_damage {
        bucket.sorties_plane_was_hit += 1;
        bucket.plane_survivability_counter += u32::from(!sortie.outcome.lost_aircraft);
        bucket.pilot_survivability_counter += u32::from(!sortie.outcome.relive);
    }

    for (aircraft, count) in &sortie.killboard_pvp {
        *bucket.killboard_planes.entry(*aircraft).or_insert(0) += count;
    }
    for (object, count) in &sortie.killboard_pve {
        *bucket.killboard_ground.entry(*object).or_insert(0) += count;
    }
}
