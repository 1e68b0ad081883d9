//! Loss-cause classification and single-source ammunition attribution.
//!
//! Attribution never guesses: a sample that cannot be pinned on exactly one
//! enemy is dropped as statistical noise, not an error.

use std::collections::{BTreeMap, HashSet};

use crate::data::{ClassBase, MissionContext, MissionLog, ObjectCatalog};
use crate::encounters::turret_owner_spec;
use crate::model::{Bucket, BucketKey, ObjectId, SortieId, VariantFilter};
use crate::registry::BucketRegistry;
use crate::sortie::{EventKind, Sortie};
use crate::store::StatsStore;
use crate::variants::classify_sortie;

/// Classify a lost sortie's terminal damage as accident or anti-aircraft
/// fire and bump the corresponding loss counters.
///
/// No damaging object class on record means the loss was self-inflicted
/// (terrain, fuel, structural failure). A record where every known damaging
/// class is AA-typed counts as an AA loss; unknown classes in the mix do
/// not veto that.
pub fn process_aa_accident_death<M: MissionContext>(
    mission: &M,
    bucket: &mut Bucket,
    sortie: &Sortie,
) {
    if !sortie.outcome.lost_aircraft {
        return;
    }

    let mut damaging_classes: HashSet<Option<&str>> = HashSet::new();
    for entry in mission.entries_against(sortie.id) {
        if !matches!(
            entry.kind,
            EventKind::Shotdown | EventKind::Killed | EventKind::Destroyed
        ) {
            continue;
        }
        damaging_classes.insert(mission.object(entry.attacker.object).map(|spec| spec.cls.as_str()));
    }

    if damaging_classes.iter().all(Option::is_none) {
        bucket.aircraft_lost_to_accident += 1;
        if sortie.outcome.relive {
            bucket.deaths_to_accident += 1;
        }
        return;
    }

    let only_aa = damaging_classes
        .iter()
        .flatten()
        .all(|cls| cls.contains("aa"));
    if only_aa {
        bucket.aircraft_lost_to_aa += 1;
        if sortie.outcome.relive {
            bucket.deaths_to_aa += 1;
        }
    }
}

/// Secondary ammunition types that vanish from the log when a weapon
/// destroys its target within one gun cycle; the missing companion type is
/// inserted as a zero count so downstream ratio computations keep both keys.
const COMPANION_AMMO: &[(&str, &str)] = &[
    ("SHELL_ENG_20x110_AP", "SHELL_ENG_20x110_HE"),
    ("SHELL_GER_20x82_AP", "SHELL_GER_20x82_HE"),
    ("SHELL_GER_15x96_AP", "SHELL_GER_15x96_HE"),
];

fn fill_in_ammo(received: &mut BTreeMap<String, u64>, ap_ammo: &str, he_ammo: &str) {
    if !received.contains_key(ap_ammo) && received.contains_key(he_ammo) {
        received.insert(ap_ammo.to_string(), 0);
    }
    if !received.contains_key(he_ammo) && received.contains_key(ap_ammo) {
        received.insert(he_ammo.to_string(), 0);
    }
}

/// Distinct (object, owning sortie) pairs that damaged the victim, in log
/// order. Aircraft without an owning sortie (AI) are excluded.
fn damage_source_pairs<M: MissionContext>(
    mission: &M,
    sortie: &Sortie,
) -> Vec<(ObjectId, Option<SortieId>)> {
    let mut pairs: Vec<(ObjectId, Option<SortieId>)> = Vec::new();
    for entry in mission.entries_against(sortie.id) {
        if !entry.kind.is_encounter() {
            continue;
        }
        let Some(spec) = mission.object(entry.attacker.object) else {
            continue;
        };
        let eligible = matches!(
            spec.cls_base,
            ClassBase::Aircraft | ClassBase::Vehicle | ClassBase::Turret
        ) || spec.cls.contains("tank");
        if !eligible {
            continue;
        }
        if spec.cls_base == ClassBase::Aircraft && entry.attacker.sortie.is_none() {
            continue;
        }
        let pair = (entry.attacker.object, entry.attacker.sortie);
        if !pairs.contains(&pair) {
            pairs.push(pair);
        }
    }
    pairs
}

/// Whether every damage source is a turret whose reconstructed owning
/// airframe is one and the same. Covers the victim hit by several turrets
/// of a single bomber.
fn all_turrets_of_one_aircraft<M: MissionContext>(
    mission: &M,
    pairs: &[(ObjectId, Option<SortieId>)],
) -> bool {
    let mut owners: HashSet<ObjectId> = HashSet::new();
    for (object, _) in pairs {
        let Some(spec) = mission.object(*object) else {
            return false;
        };
        if !spec.is_aircraft_turret() {
            return false;
        }
        let Some(owner) = turret_owner_spec(mission, &spec.name) else {
            return false;
        };
        owners.insert(owner.id);
        if owners.len() != 1 {
            return false;
        }
    }
    !owners.is_empty()
}

/// Attribute a single-source loss's ammunition totals: received to the
/// victim's bucket, given to the identified enemy's base (and, when
/// classified, variant-filtered) bucket.
///
/// The subtype pass only records the received side; the aggregate pass has
/// already credited the enemy.
///
/// # Errors
///
/// Returns the store's error if a bucket resolution fails.
pub fn process_ammo_breakdown<S: StatsStore, M: MissionContext>(
    store: &mut S,
    mission: &M,
    buckets: &mut BucketRegistry,
    bucket_key: &BucketKey,
    sortie: &Sortie,
    is_subtype: bool,
) -> Result<(), S::Error> {
    if !sortie.outcome.lost_aircraft {
        return Ok(());
    }
    let Some(breakdown) = &sortie.ammo.breakdown else {
        return Ok(());
    };
    if !breakdown.single_source {
        return Ok(());
    }

    let pairs = damage_source_pairs(mission, sortie);
    if pairs.len() != 1 {
        // The "Hits" and "Damage" records occasionally disagree; unless the
        // extra sources are all turrets of one airframe, throw the sample
        // out rather than attribute it to the wrong enemy.
        let multi_turret = pairs.len() > 1
            && breakdown.last_turret_account.is_some()
            && all_turrets_of_one_aircraft(mission, &pairs);
        if !multi_turret {
            log::debug!(
                "indeterminate ammo attribution for sortie {:?} ({} sources), dropping sample",
                sortie.id,
                pairs.len()
            );
            return Ok(());
        }
    }

    let mut received = breakdown.total_received.clone();
    for (ap_ammo, he_ammo) in COMPANION_AMMO {
        fill_in_ammo(&mut received, ap_ammo, he_ammo);
    }

    if let Some(bucket) = buckets.cached_mut(bucket_key) {
        bucket.merge_ammo_received(&received);
    }

    if is_subtype {
        return Ok(());
    }

    let Some(&(enemy_object, enemy_sortie_id)) = pairs.first() else {
        return Ok(());
    };
    let Some(enemy_spec) = mission.object(enemy_object) else {
        return Ok(());
    };
    if !enemy_spec.is_aircraft() && !enemy_spec.is_aircraft_turret() {
        return Ok(());
    }
    if enemy_spec.is_aircraft() && enemy_sortie_id.is_none() {
        return Ok(());
    }

    if enemy_spec.is_aircraft() {
        let Some(id) = enemy_sortie_id else {
            return Ok(());
        };
        let Some(enemy_sortie) = mission.sortie(id) else {
            log::warn!("ammo attribution references unknown sortie {id:?}");
            return Ok(());
        };
        let filter = classify_sortie(enemy_sortie, enemy_spec);
        let pilot_scope = if bucket_key.pilot.is_some() {
            enemy_sortie.pilot
        } else {
            None
        };
        let base_key = BucketKey {
            tour: enemy_sortie.tour,
            aircraft: enemy_object,
            filter: VariantFilter::NoFilter,
            pilot: pilot_scope,
        };
        buckets.resolve(store, &base_key)?.merge_ammo_given(&received);

        if !filter.is_no_filter() && enemy_sortie.pilot.is_some() {
            let filtered_key = BucketKey {
                tour: bucket_key.tour,
                aircraft: enemy_object,
                filter,
                pilot: pilot_scope,
            };
            buckets
                .resolve(store, &filtered_key)?
                .merge_ammo_given(&received);
        }
    } else {
        // Turret: the owning sortie is unknowable from the log. The pilot
        // pass needs the last-turret-account record to find the gunner's
        // pilot bucket; without it the sample stays with the aggregate
        // pass, which credits the pilot-less enemy bucket.
        let turret_key = if bucket_key.pilot.is_some() {
            let Some(account) = &breakdown.last_turret_account else {
                return Ok(());
            };
            let Some(enemy_pilot) = mission.pilot_for_account(account, bucket_key.tour) else {
                log::debug!("no pilot registered for turret account {account}");
                return Ok(());
            };
            turret_owner_spec(mission, &enemy_spec.name).map(|owner| BucketKey {
                tour: bucket_key.tour,
                aircraft: owner.id,
                filter: VariantFilter::NoFilter,
                pilot: Some(enemy_pilot),
            })
        } else {
            turret_owner_spec(mission, &enemy_spec.name).map(|owner| BucketKey {
                tour: bucket_key.tour,
                aircraft: owner.id,
                filter: VariantFilter::NoFilter,
                pilot: None,
            })
        };
        if let Some(key) = turret_key {
            buckets.resolve(store, &key)?.merge_ammo_given(&received);
        }
    }

    Ok(())
}
