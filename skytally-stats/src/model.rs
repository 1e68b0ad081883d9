//! Aggregate entities shared across sortie-processing passes: buckets,
//! killboards, and the per-sortie augmentation flags.
//!
//! All of these are owned by the persistence collaborator between passes;
//! within a pass they live in the registries and are mutated in place.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::rating::RATING_BASELINE;

/// Season/epoch scoping all buckets and killboards.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct TourId(pub u32);

/// Taxonomy id of a game object (airframe, turret, vehicle, ...).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct ObjectId(pub u32);

/// One pilot's single flight record within a tour.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct SortieId(pub u64);

/// A registered pilot within a tour.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct PilotId(pub u32);

/// Store-allocated bucket id. Strictly increasing; killboard slot
/// normalization orders pairs by this id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct BucketId(pub u64);

/// Coalition tag from the mission logs. Sides are opaque to the engine;
/// only equality matters (friendly-fire exclusion).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Coalition(pub u8);

/// Variant classification of a bucket.
///
/// `NoFilter` aggregates across all variants of an airframe; airframes with
/// no recognized variant are only ever stored under `NoFilter`. The named
/// values are a closed taxonomy derived from the sortie's loadout by
/// [`crate::variants::classify_sortie`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VariantFilter {
    #[default]
    NoFilter,
    /// Bomb-capable airframe flying with bombs aboard.
    Bombs,
    /// Bomb-capable airframe flying clean.
    NoBombs,
    /// Boost-capable airframe flying with the uprated engine fitted.
    Boosted,
    /// Boost-capable airframe flying the stock engine.
    Stock,
}

impl VariantFilter {
    /// Whether this is the aggregate (unfiltered) classification.
    #[must_use]
    pub const fn is_no_filter(self) -> bool {
        matches!(self, Self::NoFilter)
    }
}

/// Identity key of a bucket: `(tour, airframe, variant filter, pilot?)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketKey {
    pub tour: TourId,
    pub aircraft: ObjectId,
    pub filter: VariantFilter,
    pub pilot: Option<PilotId>,
}

impl BucketKey {
    /// The pilot-less aggregate key for an airframe.
    #[must_use]
    pub const fn base(tour: TourId, aircraft: ObjectId) -> Self {
        Self {
            tour,
            aircraft,
            filter: VariantFilter::NoFilter,
            pilot: None,
        }
    }

    /// Same key with a different variant filter.
    #[must_use]
    pub fn with_filter(&self, filter: VariantFilter) -> Self {
        Self {
            filter,
            ..self.clone()
        }
    }

    /// Same key without the pilot dimension.
    #[must_use]
    pub fn without_pilot(&self) -> Self {
        Self {
            pilot: None,
            ..self.clone()
        }
    }
}

/// Rate fields recomputed from the raw counters before every persist, so
/// the display layer never recomputes them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct DerivedRates {
    pub kills_per_sortie: f64,
    pub kills_per_hour: f64,
    pub ground_kills_per_hour: f64,
    pub kd_ratio: f64,
    pub gunnery_accuracy: f64,
    pub bomb_rocket_accuracy: f64,
    pub plane_survivability: f64,
    pub pilot_survivability: f64,
    pub plane_lethality: f64,
    pub pilot_lethality: f64,
}

/// Running statistical accumulator for one `(tour, airframe, filter, pilot?)`.
///
/// Created lazily on first reference, mutated exclusively by the aggregation
/// pass, never deleted within a tour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub id: BucketId,
    pub key: BucketKey,
    /// Last observed coalition of the airframe within the tour.
    pub coalition: Option<Coalition>,

    // Sortie outcome counters.
    pub total_sorties: u32,
    /// Accumulated flight time in seconds.
    pub total_flight_time: u64,
    pub kills: u32,
    pub ground_kills: u32,
    pub assists: u32,
    pub aircraft_lost: u32,
    pub deaths: u32,
    pub captures: u32,
    pub bailouts: u32,
    pub ditches: u32,
    pub landings: u32,
    pub in_flight: u32,
    pub crashes: u32,
    pub shotdown: u32,
    pub score: i64,

    // Gunnery and ordnance.
    pub ammo_shot: u64,
    pub ammo_hit: u64,
    pub bomb_rocket_shot: u64,
    pub bomb_rocket_hit: u64,

    // Survivability while hit.
    pub sorties_plane_was_hit: u32,
    pub plane_survivability_counter: u32,
    pub pilot_survivability_counter: u32,

    // Encounter-derived counters.
    pub distinct_enemies_hit: u32,
    pub plane_lethality_counter: u32,
    pub pilot_lethality_counter: u32,
    pub pilot_kills: u32,

    // Loss causes.
    pub aircraft_lost_to_accident: u32,
    pub deaths_to_accident: u32,
    pub aircraft_lost_to_aa: u32,
    pub deaths_to_aa: u32,

    /// Aggregate air-to-air kill tallies keyed by opposing airframe.
    #[serde(default)]
    pub killboard_planes: HashMap<ObjectId, u32>,
    /// Aggregate ground kill tallies keyed by opposing object.
    #[serde(default)]
    pub killboard_ground: HashMap<ObjectId, u32>,

    /// Zero-sum skill rating, updated per air-to-air victory.
    pub elo: i32,

    // Streak state. Currents reset on pilot death-and-respawn.
    pub current_score_streak: i64,
    pub current_ak_streak: u32,
    pub current_gk_streak: u32,
    pub max_score_streak: i64,
    pub max_ak_streak: u32,
    pub max_gk_streak: u32,
    /// Achieving pilot, tracked on the pilot-less aggregate bucket.
    pub max_score_streak_pilot: Option<PilotId>,
    pub max_ak_streak_pilot: Option<PilotId>,
    pub max_gk_streak_pilot: Option<PilotId>,

    // Best single sortie.
    pub best_score_in_sortie: i64,
    pub best_ak_in_sortie: u32,
    pub best_gk_in_sortie: u32,
    pub best_score_sortie: Option<SortieId>,
    pub best_ak_sortie: Option<SortieId>,
    pub best_gk_sortie: Option<SortieId>,

    /// Ammunition-type totals this bucket received from attributed hits.
    #[serde(default)]
    pub ammo_received: BTreeMap<String, u64>,
    /// Ammunition-type totals this bucket dealt to attributed victims.
    #[serde(default)]
    pub ammo_given: BTreeMap<String, u64>,
    pub ammo_received_incidents: u32,
    pub ammo_given_incidents: u32,

    #[serde(default)]
    pub derived: DerivedRates,
}

impl Bucket {
    /// Fresh bucket for a key: counters zero, rating at the baseline.
    #[must_use]
    pub fn new(id: BucketId, key: BucketKey) -> Self {
        Self {
            id,
            key,
            coalition: None,
            total_sorties: 0,
            total_flight_time: 0,
            kills: 0,
            ground_kills: 0,
            assists: 0,
            aircraft_lost: 0,
            deaths: 0,
            captures: 0,
            bailouts: 0,
            ditches: 0,
            landings: 0,
            in_flight: 0,
            crashes: 0,
            shotdown: 0,
            score: 0,
            ammo_shot: 0,
            ammo_hit: 0,
            bomb_rocket_shot: 0,
            bomb_rocket_hit: 0,
            sorties_plane_was_hit: 0,
            plane_survivability_counter: 0,
            pilot_survivability_counter: 0,
            distinct_enemies_hit: 0,
            plane_lethality_counter: 0,
            pilot_lethality_counter: 0,
            pilot_kills: 0,
            aircraft_lost_to_accident: 0,
            deaths_to_accident: 0,
            aircraft_lost_to_aa: 0,
            deaths_to_aa: 0,
            killboard_planes: HashMap::new(),
            killboard_ground: HashMap::new(),
            elo: RATING_BASELINE,
            current_score_streak: 0,
            current_ak_streak: 0,
            current_gk_streak: 0,
            max_score_streak: 0,
            max_ak_streak: 0,
            max_gk_streak: 0,
            max_score_streak_pilot: None,
            max_ak_streak_pilot: None,
            max_gk_streak_pilot: None,
            best_score_in_sortie: 0,
            best_ak_in_sortie: 0,
            best_gk_in_sortie: 0,
            best_score_sortie: None,
            best_ak_sortie: None,
            best_gk_sortie: None,
            ammo_received: BTreeMap::new(),
            ammo_given: BTreeMap::new(),
            ammo_received_incidents: 0,
            ammo_given_incidents: 0,
            derived: DerivedRates::default(),
        }
    }

    /// Merge one attributed ammunition sample into the received totals.
    pub fn merge_ammo_received(&mut self, sample: &BTreeMap<String, u64>) {
        for (ammo_type, count) in sample {
            *self.ammo_received.entry(ammo_type.clone()).or_insert(0) += count;
        }
        self.ammo_received_incidents = self.ammo_received_incidents.saturating_add(1);
    }

    /// Merge one attributed ammunition sample into the given totals.
    pub fn merge_ammo_given(&mut self, sample: &BTreeMap<String, u64>) {
        for (ammo_type, count) in sample {
            *self.ammo_given.entry(ammo_type.clone()).or_insert(0) += count;
        }
        self.ammo_given_incidents = self.ammo_given_incidents.saturating_add(1);
    }

    /// Recompute the stored rate fields from the raw counters.
    pub fn recompute_derived(&mut self) {
        let hours = to_f64(self.total_flight_time) / 3600.0;
        self.derived = DerivedRates {
            kills_per_sortie: ratio(u64::from(self.kills), u64::from(self.total_sorties)),
            kills_per_hour: per_hour(u64::from(self.kills), hours),
            ground_kills_per_hour: per_hour(u64::from(self.ground_kills), hours),
            kd_ratio: ratio(u64::from(self.kills), u64::from(self.aircraft_lost)),
            gunnery_accuracy: ratio(self.ammo_hit, self.ammo_shot),
            bomb_rocket_accuracy: ratio(self.bomb_rocket_hit, self.bomb_rocket_shot),
            plane_survivability: ratio(
                u64::from(self.plane_survivability_counter),
                u64::from(self.sorties_plane_was_hit),
            ),
            pilot_survivability: ratio(
                u64::from(self.pilot_survivability_counter),
                u64::from(self.sorties_plane_was_hit),
            ),
            plane_lethality: ratio(
                u64::from(self.plane_lethality_counter),
                u64::from(self.distinct_enemies_hit),
            ),
            pilot_lethality: ratio(
                u64::from(self.pilot_lethality_counter),
                u64::from(self.distinct_enemies_hit),
            ),
        };
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        to_f64(numerator) / to_f64(denominator)
    }
}

fn per_hour(count: u64, hours: f64) -> f64 {
    if hours > 0.0 { to_f64(count) / hours } else { 0.0 }
}

#[allow(clippy::cast_precision_loss)]
fn to_f64(value: u64) -> f64 {
    value as f64
}

/// Identity key of a killboard: tour plus the bucket pair normalized by
/// ascending bucket id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KillboardKey {
    pub tour: TourId,
    pub first: BucketId,
    pub second: BucketId,
}

impl KillboardKey {
    /// Normalize a pair so the smaller bucket id occupies the first slot,
    /// independent of which side initiated resolution.
    #[must_use]
    pub fn paired(tour: TourId, a: BucketId, b: BucketId) -> Self {
        if a <= b {
            Self {
                tour,
                first: a,
                second: b,
            }
        } else {
            Self {
                tour,
                first: b,
                second: a,
            }
        }
    }
}

/// One slot of a killboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct KillboardSide {
    /// Encounters in which this side landed at least one hit.
    pub distinct_hits: u32,
    /// Hits that led to a shotdown credited elsewhere.
    pub assists: u32,
    /// Hits that led to a pilot kill credited elsewhere.
    pub pk_assists: u32,
    pub shotdown: u32,
    pub pilot_kills: u32,
}

/// Pairwise head-to-head record between two buckets.
///
/// Symmetric bookkeeping: every encounter increments exactly one slot's
/// counters; slot assignment is purely by bucket id order, never by outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Killboard {
    pub key: KillboardKey,
    pub first: KillboardSide,
    pub second: KillboardSide,
    /// Data-fix marker consumed by the doubled-turret-killboard rebuild job.
    #[serde(default)]
    pub turret_double_count_fixed: bool,
    /// Data-fix marker consumed by the pilot-loss backfill job.
    #[serde(default)]
    pub pilot_loss_backfilled: bool,
}

impl Killboard {
    #[must_use]
    pub fn new(key: KillboardKey) -> Self {
        Self {
            key,
            first: KillboardSide::default(),
            second: KillboardSide::default(),
            turret_double_count_fixed: false,
            pilot_loss_backfilled: false,
        }
    }

    /// The slot belonging to `bucket`.
    #[must_use]
    pub fn side_mut(&mut self, bucket: BucketId) -> &mut KillboardSide {
        if self.key.first == bucket {
            &mut self.first
        } else {
            &mut self.second
        }
    }

    #[must_use]
    pub fn side(&self, bucket: BucketId) -> &KillboardSide {
        if self.key.first == bucket {
            &self.first
        } else {
            &self.second
        }
    }
}

/// Per-sortie idempotency and data-fix flags.
///
/// The aggregation pass sets these on success; external reprocessing jobs
/// check them before invoking the (intentionally non-idempotent) aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortieAugmentation {
    pub sortie: SortieId,
    pub sortie_stats_processed: bool,
    pub player_stats_processed: bool,
    pub fixed_aa_accident_stats: bool,
    pub fixed_doubled_turret_killboards: bool,
    pub added_player_kb_losses: bool,
}

impl SortieAugmentation {
    #[must_use]
    pub const fn new(sortie: SortieId) -> Self {
        Self {
            sortie,
            sortie_stats_processed: false,
            player_stats_processed: false,
            fixed_aa_accident_stats: false,
            fixed_doubled_turret_killboards: false,
            added_player_kb_losses: false,
        }
    }
}
