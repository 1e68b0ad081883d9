//! Collaborator seams consumed by the engine: the object taxonomy, the
//! player registry, and the mission log. Host applications adapt their own
//! storage behind these traits; [`MissionData`] is the in-memory reference
//! implementation used by the test suites.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::{ObjectId, PilotId, SortieId, TourId};
use crate::sortie::{LogEntry, Sortie};

/// Coarse object family from the taxonomy database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassBase {
    Aircraft,
    Turret,
    Vehicle,
    Block,
    Other,
}

/// Taxonomy record for a game object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSpec {
    pub id: ObjectId,
    /// Unique object name, e.g. `"La-5FN ser.2"` or `"Ju 88 A-4_turret"`.
    pub name: String,
    /// Fine-grained class, e.g. `"aircraft_turret"`, `"aa_mg"`, `"tank_medium"`.
    pub cls: String,
    pub cls_base: ClassBase,
}

impl ObjectSpec {
    #[must_use]
    pub fn new(id: ObjectId, name: &str, cls: &str, cls_base: ClassBase) -> Self {
        Self {
            id,
            name: name.to_string(),
            cls: cls.to_string(),
            cls_base,
        }
    }

    #[must_use]
    pub fn is_aircraft(&self) -> bool {
        self.cls_base == ClassBase::Aircraft
    }

    /// Gun turrets mounted on aircraft, as opposed to tank or ship turrets.
    #[must_use]
    pub fn is_aircraft_turret(&self) -> bool {
        self.cls == "aircraft_turret"
    }
}

/// Lookup into the object/aircraft taxonomy database.
pub trait ObjectCatalog {
    fn object(&self, id: ObjectId) -> Option<&ObjectSpec>;
    fn object_by_name(&self, name: &str) -> Option<&ObjectSpec>;
}

/// Lookup into the per-tour player registry.
pub trait PlayerDirectory {
    /// Resolve the pilot flying for a platform account within a tour.
    fn pilot_for_account(&self, account: &str, tour: TourId) -> Option<PilotId>;
}

/// Read access to sortie records and the combat log stream.
pub trait MissionLog {
    /// Entries in which the given sortie is the acting side, in log order.
    fn entries_by(&self, sortie: SortieId) -> Vec<&LogEntry>;
    /// Entries in which the given sortie is the affected side, in log order.
    fn entries_against(&self, sortie: SortieId) -> Vec<&LogEntry>;
    fn sortie(&self, id: SortieId) -> Option<&Sortie>;
    /// All sorties from `tour_cutoff` onwards, used by background jobs to
    /// find work.
    fn sorties_since(&self, tour_cutoff: TourId) -> Vec<&Sortie>;
}

/// Umbrella bound for everything a processing pass reads.
pub trait MissionContext: ObjectCatalog + PlayerDirectory + MissionLog {}

impl<T: ObjectCatalog + PlayerDirectory + MissionLog> MissionContext for T {}

/// In-memory mission context.
#[derive(Debug, Clone, Default)]
pub struct MissionData {
    objects: HashMap<ObjectId, ObjectSpec>,
    names: HashMap<String, ObjectId>,
    sorties: HashMap<SortieId, Sortie>,
    entries: Vec<LogEntry>,
    accounts: HashMap<(String, TourId), PilotId>,
}

impl MissionData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_object(&mut self, spec: ObjectSpec) {
        self.names.insert(spec.name.clone(), spec.id);
        self.objects.insert(spec.id, spec);
    }

    pub fn insert_sortie(&mut self, sortie: Sortie) {
        self.sorties.insert(sortie.id, sortie);
    }

    pub fn push_entry(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    pub fn link_account(&mut self, account: &str, tour: TourId, pilot: PilotId) {
        self.accounts.insert((account.to_string(), tour), pilot);
    }
}

impl ObjectCatalog for MissionData {
    fn object(&self, id: ObjectId) -> Option<&ObjectSpec> {
        self.objects.get(&id)
    }

    fn object_by_name(&self, name: &str) -> Option<&ObjectSpec> {
        self.names.get(name).and_then(|id| self.objects.get(id))
    }
}

impl PlayerDirectory for MissionData {
    fn pilot_for_account(&self, account: &str, tour: TourId) -> Option<PilotId> {
        self.accounts.get(&(account.to_string(), tour)).copied()
    }
}

impl MissionLog for MissionData {
    fn entries_by(&self, sortie: SortieId) -> Vec<&LogEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.attacker.sortie == Some(sortie))
            .collect()
    }

    fn entries_against(&self, sortie: SortieId) -> Vec<&LogEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.target.sortie == Some(sortie))
            .collect()
    }

    fn sortie(&self, id: SortieId) -> Option<&Sortie> {
        self.sorties.get(&id)
    }

    fn sorties_since(&self, tour_cutoff: TourId) -> Vec<&Sortie> {
        let mut found: Vec<&Sortie> = self
            .sorties
            .values()
            .filter(|sortie| sortie.tour >= tour_cutoff)
            .collect();
        found.sort_by_key(|sortie| sortie.id);
        found
    }
}
