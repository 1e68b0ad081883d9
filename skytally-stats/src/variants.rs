//! Variant taxonomy: which airframes have recognized sub-variants, and the
//! pure classification of a sortie into a [`VariantFilter`].

use crate::data::ObjectSpec;
use crate::model::VariantFilter;
use crate::sortie::Sortie;

/// Airframes tracked separately when flying with bombs aboard.
/// Halberstadt CL.II is also turreted; see the turret-encounter limitation
/// in [`crate::encounters`].
const BOMB_VARIANT_AIRCRAFT: &[&str] = &[
    "Bf 109 F-4",
    "Fw 190 A-8",
    "P-47D-28",
    "Spitfire Mk.IXe",
    "La-5FN ser.2",
    "Yak-9 ser.1",
    "Halberstadt CL.II",
];

/// Airframes tracked separately when the uprated-engine modification is
/// fitted (high-octane fuel, increased boost pressure).
const BOOST_VARIANT_AIRCRAFT: &[&str] = &[
    "Spitfire Mk.IXe",
    "P-51D-15",
    "P-47D-28",
    "Tempest Mk.V ser.2",
    "Bf 109 K-4",
];

/// Whether the airframe has a recognized bomb-loadout variant.
#[must_use]
pub fn has_bomb_variant(aircraft_name: &str) -> bool {
    BOMB_VARIANT_AIRCRAFT.contains(&aircraft_name)
}

/// Whether the airframe has a recognized boosted-engine variant.
#[must_use]
pub fn has_boost_variant(aircraft_name: &str) -> bool {
    BOOST_VARIANT_AIRCRAFT.contains(&aircraft_name)
}

/// Whether the airframe has any recognized variant and therefore gets a
/// second, filtered bucket per sortie.
#[must_use]
pub fn has_recognized_variant(aircraft_name: &str) -> bool {
    has_bomb_variant(aircraft_name) || has_boost_variant(aircraft_name)
}

/// Classify a sortie into its variant filter.
///
/// Pure function over the sortie's loadout and the airframe taxonomy.
/// Airframes carrying both variant families classify by the bomb dimension
/// first. Airframes with no recognized variant always classify `NoFilter`.
#[must_use]
pub fn classify_sortie(sortie: &Sortie, aircraft: &ObjectSpec) -> VariantFilter {
    if has_bomb_variant(&aircraft.name) {
        if sortie.loadout.bombs {
            VariantFilter::Bombs
        } else {
            VariantFilter::NoBombs
        }
    } else if has_boost_variant(&aircraft.name) {
        if sortie.loadout.boost {
            VariantFilter::Boosted
        } else {
            VariantFilter::Stock
        }
    } else {
        VariantFilter::NoFilter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ClassBase;
    use crate::model::{Coalition, ObjectId, SortieId, TourId};

    fn aircraft(name: &str) -> ObjectSpec {
        ObjectSpec::new(ObjectId(1), name, "aircraft_fighter", ClassBase::Aircraft)
    }

    fn sortie(bombs: bool, boost: bool) -> Sortie {
        let mut sortie = Sortie::new(SortieId(1), TourId(1), ObjectId(1), Coalition(1));
        sortie.loadout.bombs = bombs;
        sortie.loadout.boost = boost;
        sortie
    }

    #[test]
    fn unrecognized_airframes_always_classify_no_filter() {
        let spec = aircraft("MiG-3 ser.24");
        assert!(!has_recognized_variant(&spec.name));
        assert_eq!(
            classify_sortie(&sortie(true, true), &spec),
            VariantFilter::NoFilter
        );
    }

    #[test]
    fn bomb_variant_classifies_by_payload() {
        let spec = aircraft("La-5FN ser.2");
        assert_eq!(
            classify_sortie(&sortie(true, false), &spec),
            VariantFilter::Bombs
        );
        assert_eq!(
            classify_sortie(&sortie(false, false), &spec),
            VariantFilter::NoBombs
        );
    }

    #[test]
    fn boost_variant_classifies_by_engine_fit() {
        let spec = aircraft("P-51D-15");
        assert_eq!(
            classify_sortie(&sortie(false, true), &spec),
            VariantFilter::Boosted
        );
        assert_eq!(
            classify_sortie(&sortie(false, false), &spec),
            VariantFilter::Stock
        );
    }

    #[test]
    fn bombs_take_priority_over_boost() {
        let spec = aircraft("P-47D-28");
        assert_eq!(
            classify_sortie(&sortie(true, true), &spec),
            VariantFilter::Bombs
        );
        assert_eq!(
            classify_sortie(&sortie(false, true), &spec),
            VariantFilter::NoBombs
        );
    }
}
