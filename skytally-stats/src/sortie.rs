//! Immutable sortie records and mission log entries, as produced by the
//! upstream ingestion pipeline. The engine never mutates these.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::model::{Coalition, ObjectId, PilotId, SortieId, TourId};

/// Boolean outcome flags of a completed sortie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SortieOutcome {
    /// The sortie ended without ever taking off.
    pub not_takeoff: bool,
    pub lost_aircraft: bool,
    pub dead: bool,
    pub captured: bool,
    pub bailout: bool,
    pub ditched: bool,
    pub landed: bool,
    pub in_flight: bool,
    pub crashed: bool,
    pub shotdown: bool,
    /// The pilot died and respawned; streak counters reset on this.
    pub relive: bool,
}

/// Loadout facts used by variant classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Loadout {
    /// Bombs were aboard at takeoff.
    pub bombs: bool,
    /// The uprated/boosted engine modification was fitted.
    pub boost: bool,
}

/// Detailed ammunition breakdown attached by the ingestion pipeline when
/// per-type hit records are available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AmmoBreakdown {
    /// Exactly one damage source dominated the terminal sequence.
    pub single_source: bool,
    /// Ammunition received by this sortie, keyed by ammunition-type name.
    #[serde(default)]
    pub total_received: BTreeMap<String, u64>,
    /// Platform account that last fired a turret at this sortie, when the
    /// log recorded one.
    pub last_turret_account: Option<String>,
}

/// Ammunition usage totals of a sortie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AmmoUsage {
    pub used_cartridges: u64,
    pub hit_bullets: u64,
    pub used_bombs: u64,
    pub hit_bombs: u64,
    pub used_rockets: u64,
    pub hit_rockets: u64,
    pub breakdown: Option<AmmoBreakdown>,
}

/// One pilot's single flight within a tour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sortie {
    pub id: SortieId,
    pub tour: TourId,
    pub aircraft: ObjectId,
    pub pilot: Option<PilotId>,
    pub coalition: Coalition,
    /// Flight time in seconds.
    pub flight_time: u64,
    pub score: i64,
    /// Air kill total.
    pub ak_total: u32,
    /// Ground kill total.
    pub gk_total: u32,
    /// Air kill assists.
    pub ak_assist: u32,
    pub outcome: SortieOutcome,
    /// The airframe took damage at some point during the sortie.
    pub took_damage: bool,
    pub ammo: AmmoUsage,
    pub loadout: Loadout,
    /// Precomputed air-to-air kill tallies keyed by opposing airframe.
    #[serde(default)]
    pub killboard_pvp: HashMap<ObjectId, u32>,
    /// Precomputed ground kill tallies keyed by opposing object.
    #[serde(default)]
    pub killboard_pve: HashMap<ObjectId, u32>,
}

impl Sortie {
    /// Minimal sortie record; callers fill in the optional detail fields.
    #[must_use]
    pub fn new(id: SortieId, tour: TourId, aircraft: ObjectId, coalition: Coalition) -> Self {
        Self {
            id,
            tour,
            aircraft,
            pilot: None,
            coalition,
            flight_time: 0,
            score: 0,
            ak_total: 0,
            gk_total: 0,
            ak_assist: 0,
            outcome: SortieOutcome::default(),
            took_damage: false,
            ammo: AmmoUsage::default(),
            loadout: Loadout::default(),
            killboard_pvp: HashMap::new(),
            killboard_pve: HashMap::new(),
        }
    }
}

/// Type of a combat log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Damaged,
    Shotdown,
    Killed,
    Destroyed,
}

impl EventKind {
    /// Whether the entry describes an air-combat encounter.
    #[must_use]
    pub const fn is_encounter(self) -> bool {
        matches!(self, Self::Damaged | Self::Shotdown | Self::Killed)
    }
}

/// One participant of a log entry. AI-controlled participants have no
/// owning sortie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSide {
    pub object: ObjectId,
    pub sortie: Option<SortieId>,
}

impl EventSide {
    #[must_use]
    pub const fn new(object: ObjectId, sortie: Option<SortieId>) -> Self {
        Self { object, sortie }
    }
}

/// Ordered combat log record: `attacker` acted on `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub kind: EventKind,
    pub attacker: EventSide,
    pub target: EventSide,
    /// Set by the ingestion pipeline when both sides shared a coalition.
    #[serde(default)]
    pub friendly_fire: bool,
}

impl LogEntry {
    #[must_use]
    pub const fn new(kind: EventKind, attacker: EventSide, target: EventSide) -> Self {
        Self {
            kind,
            attacker,
            target,
            friendly_fire: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encounter_kinds_exclude_destroyed() {
        assert!(EventKind::Damaged.is_encounter());
        assert!(EventKind::Shotdown.is_encounter());
        assert!(EventKind::Killed.is_encounter());
        assert!(!EventKind::Destroyed.is_encounter());
    }

    #[test]
    fn sortie_defaults_are_empty() {
        let sortie = Sortie::new(SortieId(1), TourId(1), ObjectId(5), Coalition(1));
        assert!(sortie.pilot.is_none());
        assert!(!sortie.outcome.lost_aircraft);
        assert!(sortie.ammo.breakdown.is_none());
    }
}
