//! Killboard pairing and per-encounter application.
//!
//! For every encounter the opposing side expands into up to four bucket
//! keys (aggregate, pilot-scoped, and their subtype-filtered variants);
//! each expanded key gets its own killboard against the current bucket.
//! Application order is damaged, then shotdown, then killed, over sets that
//! were fully resolved beforehand: the damaged step's assist logic checks
//! membership in the other two sets.

use smallvec::SmallVec;

use crate::data::{MissionContext, MissionLog, ObjectCatalog};
use crate::encounters::{EncounterPair, EncounterSets};
use crate::model::{BucketKey, TourId, VariantFilter};
use crate::rating::settle_victory;
use crate::registry::{BucketRegistry, KillboardRegistry};
use crate::sortie::Sortie;
use crate::store::StatsStore;
use crate::variants::{classify_sortie, has_recognized_variant};

/// Per-call switches for [`update_from_entries`].
#[derive(Debug, Clone, Copy)]
pub struct EngagementFlags {
    /// The current bucket's airframe has recognized variants.
    pub has_subtype: bool,
    /// The current pass is the subtype-filtered pass. Rating updates for
    /// the enemy side happen once, from the aggregate pass.
    pub is_subtype: bool,
    /// Expand pilot-scoped killboard keys for the opposing side.
    pub use_pilot_kbs: bool,
    /// Credit the current (primary) bucket's own counters. Off when a
    /// reprocessing job rebuilds killboards only.
    pub update_primary: bool,
}

type KeyExpansion = SmallVec<[BucketKey; 4]>;

fn push_unique(keys: &mut KeyExpansion, key: BucketKey) {
    if !keys.contains(&key) {
        keys.push(key);
    }
}

/// Killboard-relevant bucket keys for the opposing side of one encounter.
fn enemy_bucket_keys<M: MissionContext>(
    mission: &M,
    tour: TourId,
    pair: EncounterPair,
    enemy_sortie: &Sortie,
    flags: EngagementFlags,
) -> KeyExpansion {
    let mut keys = KeyExpansion::new();
    let aggregate = BucketKey {
        tour,
        aircraft: pair.aircraft,
        filter: VariantFilter::NoFilter,
        pilot: None,
    };
    if flags.update_primary {
        push_unique(&mut keys, aggregate.clone());
    }
    if flags.use_pilot_kbs {
        let mut pilot_key = aggregate.clone();
        pilot_key.pilot = enemy_sortie.pilot;
        push_unique(&mut keys, pilot_key);
    }
    if let Some(spec) = mission.object(pair.aircraft) {
        if has_recognized_variant(&spec.name) {
            let filter = classify_sortie(enemy_sortie, spec);
            if flags.update_primary {
                push_unique(&mut keys, aggregate.with_filter(filter));
            }
            if flags.use_pilot_kbs {
                let mut pilot_key = aggregate.with_filter(filter);
                pilot_key.pilot = enemy_sortie.pilot;
                push_unique(&mut keys, pilot_key);
            }
        }
    }
    keys
}

/// Apply one sortie's resolved encounter sets to the current bucket, the
/// opposing buckets, the pairwise killboards, and the ratings.
///
/// # Errors
///
/// Returns the store's error if any bucket or killboard resolution fails.
#[allow(clippy::too_many_arguments)]
pub fn update_from_entries<S: StatsStore, M: MissionContext>(
    store: &mut S,
    mission: &M,
    buckets: &mut BucketRegistry,
    killboards: &mut KillboardRegistry,
    bucket_key: &BucketKey,
    sets: &EncounterSets,
    flags: EngagementFlags,
) -> Result<(), S::Error> {
    let tour = bucket_key.tour;
    let our_id = buckets.resolve_id(store, bucket_key)?;

    for pair in &sets.damaged {
        let Some(enemy_sortie) = mission.sortie(pair.sortie) else {
            log::warn!("damaged encounter references unknown sortie {:?}", pair.sortie);
            continue;
        };
        let enemy_shotdown = enemy_sortie.outcome.shotdown;
        let enemy_dead = enemy_sortie.outcome.dead;
        for enemy_key in enemy_bucket_keys(mission, tour, *pair, enemy_sortie, flags) {
            let enemy_id = buckets.resolve_id(store, &enemy_key)?;
            let kb = killboards.resolve(store, tour, our_id, enemy_id)?;
            let side = kb.side_mut(our_id);
            side.distinct_hits += 1;
            if enemy_shotdown && !sets.shotdown.contains(pair) {
                side.assists += 1;
            }
            if enemy_dead && !sets.killed.contains(pair) {
                side.pk_assists += 1;
            }
            if flags.update_primary
                && let Some(bucket) = buckets.cached_mut(bucket_key)
            {
                bucket.distinct_enemies_hit += 1;
                if enemy_shotdown {
                    bucket.plane_lethality_counter += 1;
                }
                if enemy_dead {
                    bucket.pilot_lethality_counter += 1;
                }
            }
        }
    }

    for pair in &sets.shotdown {
        let Some(enemy_sortie) = mission.sortie(pair.sortie) else {
            log::warn!("shotdown encounter references unknown sortie {:?}", pair.sortie);
            continue;
        };
        if let Some(enemy_spec) = mission.object(pair.aircraft) {
            let enemy_filter = classify_sortie(enemy_sortie, enemy_spec);
            // Resolved unconditionally so the rating step (and a later
            // aggregate pass) always finds it.
            let subtype_key = BucketKey {
                tour,
                aircraft: pair.aircraft,
                filter: enemy_filter,
                pilot: None,
            };
            buckets.resolve(store, &subtype_key)?;
            if bucket_key.pilot.is_none() && flags.update_primary {
                settle_victory(
                    store,
                    buckets,
                    bucket_key,
                    pair.aircraft,
                    enemy_filter,
                    flags.has_subtype,
                    flags.is_subtype,
                )?;
            }
        }
        for enemy_key in enemy_bucket_keys(mission, tour, *pair, enemy_sortie, flags) {
            let enemy_id = buckets.resolve_id(store, &enemy_key)?;
            let kb = killboards.resolve(store, tour, our_id, enemy_id)?;
            kb.side_mut(our_id).shotdown += 1;
        }
    }

    for pair in &sets.killed {
        if flags.update_primary
            && let Some(bucket) = buckets.cached_mut(bucket_key)
        {
            bucket.pilot_kills += 1;
        }
        let Some(enemy_sortie) = mission.sortie(pair.sortie) else {
            log::warn!("killed encounter references unknown sortie {:?}", pair.sortie);
            continue;
        };
        for enemy_key in enemy_bucket_keys(mission, tour, *pair, enemy_sortie, flags) {
            let enemy_id = buckets.resolve_id(store, &enemy_key)?;
            let kb = killboards.resolve(store, tour, our_id, enemy_id)?;
            kb.side_mut(our_id).pilot_kills += 1;
        }
    }

    Ok(())
}
