//! Log-entry clustering into encounter sets.
//!
//! Resolution is a separate phase from application: the damaged set's
//! assist logic checks membership in the shotdown/killed sets, so all
//! three sets must be fully known before any of them is applied.

use std::collections::HashSet;

use crate::data::{MissionContext, MissionLog, ObjectCatalog};
use crate::model::{ObjectId, SortieId};
use crate::sortie::Sortie;

/// One opposing (airframe, sortie) pair drawn from the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncounterPair {
    pub aircraft: ObjectId,
    pub sortie: SortieId,
}

/// Disjoint-by-type encounter sets for one sortie.
#[derive(Debug, Clone, Default)]
pub struct EncounterSets {
    pub damaged: HashSet<EncounterPair>,
    pub shotdown: HashSet<EncounterPair>,
    pub killed: HashSet<EncounterPair>,
}

impl EncounterSets {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.damaged.is_empty() && self.shotdown.is_empty() && self.killed.is_empty()
    }

    /// Sets describing a single opposing pair present in the given
    /// categories. Used by the turret re-entry, where one turret maps to
    /// at most one victim pair.
    #[must_use]
    pub fn single(pair: EncounterPair, damaged: bool, shotdown: bool, killed: bool) -> Self {
        let mut sets = Self::default();
        if damaged {
            sets.damaged.insert(pair);
        }
        if shotdown {
            sets.shotdown.insert(pair);
        }
        if killed {
            sets.killed.insert(pair);
        }
        sets
    }
}

/// Cluster the main-armament encounters of a sortie.
///
/// Admits entries typed damaged/shotdown/killed where both participants are
/// aircraft with a known owning sortie (AI participants lack one) and the
/// two sorties belong to opposing sides.
pub fn resolve_main_encounters<M: MissionContext>(mission: &M, sortie: &Sortie) -> EncounterSets {
    let mut sets = EncounterSets::default();
    for entry in mission.entries_by(sortie.id) {
        if !entry.kind.is_encounter() {
            continue;
        }
        let Some(enemy_sortie_id) = entry.target.sortie else {
            continue;
        };
        let (Some(attacker), Some(target)) = (
            mission.object(entry.attacker.object),
            mission.object(entry.target.object),
        ) else {
            continue;
        };
        if !attacker.is_aircraft() || !target.is_aircraft() {
            continue;
        }
        let Some(enemy_sortie) = mission.sortie(enemy_sortie_id) else {
            log::warn!("log entry references unknown sortie {enemy_sortie_id:?}, skipping");
            continue;
        };
        if enemy_sortie.coalition == sortie.coalition {
            continue;
        }
        let pair = EncounterPair {
            aircraft: entry.target.object,
            sortie: enemy_sortie_id,
        };
        match entry.kind {
            crate::sortie::EventKind::Damaged => sets.damaged.insert(pair),
            crate::sortie::EventKind::Shotdown => sets.shotdown.insert(pair),
            crate::sortie::EventKind::Killed => sets.killed.insert(pair),
            crate::sortie::EventKind::Destroyed => false,
        };
    }
    sets
}

/// Per-turret-name encounter flags reconstructed from the victim's side of
/// the log.
///
/// The event log never records what a sortie's own turrets did, only which
/// turrets hit the sortie. Turret credit is therefore rebuilt from the
/// perspective of the sortie that was hit: each turret name seen firing at
/// the sortie becomes one pseudo-encounter whose victim is the sortie
/// itself.
#[derive(Debug, Clone, Default)]
pub struct TurretEncounters {
    pub damaged: HashSet<String>,
    pub shotdown: HashSet<String>,
    pub killed: HashSet<String>,
}

impl TurretEncounters {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.damaged.is_empty() && self.shotdown.is_empty() && self.killed.is_empty()
    }

    /// Every turret name seen in any category.
    #[must_use]
    pub fn names(&self) -> HashSet<&str> {
        self.damaged
            .iter()
            .chain(&self.shotdown)
            .chain(&self.killed)
            .map(String::as_str)
            .collect()
    }
}

/// Cluster the turret encounters against a sortie.
///
/// Admits entries typed damaged/shotdown/killed whose acting object is an
/// aircraft gun turret and whose target is this (aircraft-owning, non-AI)
/// sortie, excluding entries flagged as friendly fire.
pub fn resolve_turret_encounters<M: MissionContext>(
    mission: &M,
    sortie: &Sortie,
) -> TurretEncounters {
    let mut turrets = TurretEncounters::default();
    for entry in mission.entries_against(sortie.id) {
        if !entry.kind.is_encounter() || entry.friendly_fire {
            continue;
        }
        let (Some(attacker), Some(target)) = (
            mission.object(entry.attacker.object),
            mission.object(entry.target.object),
        ) else {
            continue;
        };
        if !attacker.is_aircraft_turret() || !target.is_aircraft() {
            continue;
        }
        let name = attacker.name.clone();
        match entry.kind {
            crate::sortie::EventKind::Damaged => turrets.damaged.insert(name),
            crate::sortie::EventKind::Shotdown => turrets.shotdown.insert(name),
            crate::sortie::EventKind::Killed => turrets.killed.insert(name),
            crate::sortie::EventKind::Destroyed => false,
        };
    }
    turrets
}

const TURRET_SUFFIX_LEN: usize = "_turret".len();

/// Derive the owning airframe name from a turret name by stripping the
/// fixed-length turret suffix.
///
/// Returns `None` for turrets of AI-only bomber flights (not supported) and
/// for names too short to carry the suffix. One legacy name remap is
/// applied for the U-2VS, whose turret predates its airframe rename.
#[must_use]
pub fn turret_owner_aircraft(turret_name: &str) -> Option<&str> {
    let Some(stem_len) = turret_name.len().checked_sub(TURRET_SUFFIX_LEN) else {
        return None;
    };
    if stem_len == 0 || !turret_name.is_char_boundary(stem_len) {
        return None;
    }
    let stem = &turret_name[..stem_len];
    if stem.contains("B25") {
        return None;
    }
    if stem == "U-2VS" {
        return Some("U-2");
    }
    Some(stem)
}

/// Resolve a turret name to its owning airframe's taxonomy record.
///
/// A catalog miss on the derived name is non-fatal: the whole turret-credit
/// pass for that name is skipped.
pub fn turret_owner_spec<'a, C: ObjectCatalog>(
    catalog: &'a C,
    turret_name: &str,
) -> Option<&'a crate::data::ObjectSpec> {
    let owner_name = turret_owner_aircraft(turret_name)?;
    let found = catalog.object_by_name(owner_name);
    if found.is_none() {
        log::warn!("could not find aircraft for turret {turret_name}");
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ClassBase, MissionData, ObjectSpec};
    use crate::model::{Coalition, TourId};
    use crate::sortie::{EventKind, EventSide, LogEntry};

    fn fixture() -> (MissionData, Sortie, Sortie) {
        let mut mission = MissionData::new();
        mission.insert_object(ObjectSpec::new(
            ObjectId(1),
            "Fw 190 A-8",
            "aircraft_fighter",
            ClassBase::Aircraft,
        ));
        mission.insert_object(ObjectSpec::new(
            ObjectId(2),
            "La-5FN ser.2",
            "aircraft_fighter",
            ClassBase::Aircraft,
        ));
        mission.insert_object(ObjectSpec::new(
            ObjectId(3),
            "Flak 38",
            "aa_mg",
            ClassBase::Vehicle,
        ));
        let attacker = Sortie::new(SortieId(10), TourId(1), ObjectId(1), Coalition(1));
        let victim = Sortie::new(SortieId(20), TourId(1), ObjectId(2), Coalition(2));
        mission.insert_sortie(attacker.clone());
        mission.insert_sortie(victim.clone());
        (mission, attacker, victim)
    }

    fn entry(kind: EventKind, attacker: (u32, Option<u64>), target: (u32, Option<u64>)) -> LogEntry {
        LogEntry::new(
            kind,
            EventSide::new(ObjectId(attacker.0), attacker.1.map(SortieId)),
            EventSide::new(ObjectId(target.0), target.1.map(SortieId)),
        )
    }

    #[test]
    fn main_resolution_partitions_by_kind() {
        let (mut mission, attacker, _) = fixture();
        mission.push_entry(entry(EventKind::Damaged, (1, Some(10)), (2, Some(20))));
        mission.push_entry(entry(EventKind::Shotdown, (1, Some(10)), (2, Some(20))));
        mission.push_entry(entry(EventKind::Killed, (1, Some(10)), (2, Some(20))));

        let sets = resolve_main_encounters(&mission, &attacker);
        let pair = EncounterPair {
            aircraft: ObjectId(2),
            sortie: SortieId(20),
        };
        assert!(sets.damaged.contains(&pair));
        assert!(sets.shotdown.contains(&pair));
        assert!(sets.killed.contains(&pair));
    }

    #[test]
    fn main_resolution_excludes_ai_and_friendlies() {
        let (mut mission, attacker, victim) = fixture();
        // AI target: no owning sortie.
        mission.push_entry(entry(EventKind::Damaged, (1, Some(10)), (2, None)));
        // Friendly fire: same coalition.
        let mut friendly = victim;
        friendly.coalition = Coalition(1);
        mission.insert_sortie(friendly);
        mission.push_entry(entry(EventKind::Damaged, (1, Some(10)), (2, Some(20))));
        // Non-aircraft target.
        mission.push_entry(entry(EventKind::Damaged, (1, Some(10)), (3, Some(20))));

        let sets = resolve_main_encounters(&mission, &attacker);
        assert!(sets.is_empty());
    }

    #[test]
    fn duplicate_entries_collapse_into_sets() {
        let (mut mission, attacker, _) = fixture();
        mission.push_entry(entry(EventKind::Damaged, (1, Some(10)), (2, Some(20))));
        mission.push_entry(entry(EventKind::Damaged, (1, Some(10)), (2, Some(20))));
        let sets = resolve_main_encounters(&mission, &attacker);
        assert_eq!(sets.damaged.len(), 1);
    }

    #[test]
    fn turret_resolution_keys_by_turret_name() {
        let (mut mission, _, victim) = fixture();
        mission.insert_object(ObjectSpec::new(
            ObjectId(4),
            "Ju 88 A-4_turret",
            "aircraft_turret",
            ClassBase::Turret,
        ));
        mission.push_entry(entry(EventKind::Damaged, (4, None), (2, Some(20))));
        let mut flagged = entry(EventKind::Shotdown, (4, None), (2, Some(20)));
        flagged.friendly_fire = true;
        mission.push_entry(flagged);

        let turrets = resolve_turret_encounters(&mission, &victim);
        assert!(turrets.damaged.contains("Ju 88 A-4_turret"));
        assert!(turrets.shotdown.is_empty());
        assert_eq!(turrets.names().len(), 1);
    }

    #[test]
    fn turret_owner_strips_suffix_and_remaps_legacy_names() {
        assert_eq!(turret_owner_aircraft("Ju 88 A-4_turret"), Some("Ju 88 A-4"));
        assert_eq!(turret_owner_aircraft("U-2VS_turret"), Some("U-2"));
        assert_eq!(turret_owner_aircraft("B25-DT_turret"), None);
        assert_eq!(turret_owner_aircraft("_turret"), None);
    }

    #[test]
    fn turret_owner_catalog_miss_is_skipped() {
        let (mission, ..) = fixture();
        assert!(turret_owner_spec(&mission, "He 111 H-6_turret").is_none());
    }
}
