//! Zero-sum pairwise rating updates and the settlement policy for
//! combatants represented as a base/variant bucket pair.

use crate::model::{BucketKey, ObjectId, VariantFilter};
use crate::registry::BucketRegistry;
use crate::store::StatsStore;

/// Rating every new bucket starts at.
pub const RATING_BASELINE: i32 = 1200;

/// Largest amount a rating can shift per engagement. Low compared to the
/// chess-typical ~30 because engagement volume is high.
pub const RATING_K: f64 = 15.0;

/// Expected score of the winner against the loser.
#[must_use]
pub fn expected_score(winner: i32, loser: i32) -> f64 {
    let exponent = f64::from(loser - winner) / 400.0;
    1.0 / (10.0_f64.powf(exponent) + 1.0)
}

/// Single pairwise update: returns the new (winner, loser) ratings.
///
/// Both sides are rounded ties-to-even so an equal-rating duel stays
/// exactly zero-sum; independent rounding bounds the drift at 1 point.
#[must_use]
pub fn rate_duel(winner: i32, loser: i32) -> (i32, i32) {
    let shift = RATING_K * (1.0 - expected_score(winner, loser));
    (
        round_rating(f64::from(winner) + shift),
        round_rating(f64::from(loser) - shift),
    )
}

#[allow(clippy::cast_possible_truncation)]
fn round_rating(value: f64) -> i32 {
    value.round_ties_even() as i32
}

fn halved(delta: i32) -> i32 {
    round_rating(f64::from(delta) / 2.0)
}

/// Apply the rating consequences of `winner_key`'s bucket shooting down an
/// enemy airframe classified as `enemy_filter`.
///
/// Ratings are zero-sum, so every settlement touches two buckets. When one
/// underlying combatant is represented as a base/variant pair, the same
/// physical encounter is visited once per representation; the halving and
/// averaging below keep the total rating mass moved per encounter at one
/// K-step:
///
/// - Neither side split: direct pairwise update.
/// - Winner split, enemy not: each of the winner's two passes updates its
///   own bucket fully and applies half the losing delta to the enemy's
///   lone bucket.
/// - Enemy split: the winner's aggregate pass settles against the enemy's
///   aggregate sibling; the winner's subtype pass writes the losing side
///   of that duel onto the enemy's subtype sibling.
/// - Enemy split, winner not: two independent duels (against the enemy's
///   aggregate and subtype siblings), with the average of the two winning
///   deltas applied to the winner.
///
/// The halved/averaged deltas are a documented approximation kept for
/// behavior compatibility with historical rating values.
///
/// # Errors
///
/// Returns the store's error if resolving an enemy bucket fails.
pub fn settle_victory<S: StatsStore>(
    store: &mut S,
    buckets: &mut BucketRegistry,
    winner_key: &BucketKey,
    enemy_aircraft: ObjectId,
    enemy_filter: VariantFilter,
    winner_has_subtype: bool,
    winner_is_subtype_pass: bool,
) -> Result<(), S::Error> {
    let tour = winner_key.tour;
    let subtype_enemy_key = BucketKey {
        tour,
        aircraft: enemy_aircraft,
        filter: enemy_filter,
        pilot: None,
    };
    buckets.resolve(store, &subtype_enemy_key)?;

    if enemy_filter.is_no_filter() {
        // The enemy airframe has no variants; subtype_enemy_key is its only
        // rating-bearing bucket.
        if winner_has_subtype {
            let old_enemy = rating_of(buckets, &subtype_enemy_key);
            let (new_winner, new_enemy) = rate_duel(rating_of(buckets, winner_key), old_enemy);
            set_rating(buckets, winner_key, new_winner);
            // This enemy rating is touched once per winner pass; take half
            // the (negative) delta each time.
            set_rating(
                buckets,
                &subtype_enemy_key,
                old_enemy + halved(new_enemy - old_enemy),
            );
        } else {
            let (new_winner, new_enemy) = rate_duel(
                rating_of(buckets, winner_key),
                rating_of(buckets, &subtype_enemy_key),
            );
            set_rating(buckets, winner_key, new_winner);
            set_rating(buckets, &subtype_enemy_key, new_enemy);
        }
    } else {
        let enemy_base_key = BucketKey {
            tour,
            aircraft: enemy_aircraft,
            filter: VariantFilter::NoFilter,
            pilot: None,
        };
        buckets.resolve(store, &enemy_base_key)?;

        if winner_has_subtype {
            let (new_winner, new_loser) = rate_duel(
                rating_of(buckets, winner_key),
                rating_of(buckets, &enemy_base_key),
            );
            set_rating(buckets, winner_key, new_winner);
            if winner_is_subtype_pass {
                set_rating(buckets, &subtype_enemy_key, new_loser);
            } else {
                set_rating(buckets, &enemy_base_key, new_loser);
            }
        } else {
            let old_winner = rating_of(buckets, winner_key);
            let (first_winner, first_loser) =
                rate_duel(old_winner, rating_of(buckets, &enemy_base_key));
            set_rating(buckets, &enemy_base_key, first_loser);
            let (second_winner, second_loser) =
                rate_duel(old_winner, rating_of(buckets, &subtype_enemy_key));
            set_rating(buckets, &subtype_enemy_key, second_loser);

            let first_delta = f64::from(first_winner - old_winner);
            let second_delta = f64::from(second_winner - old_winner);
            set_rating(
                buckets,
                winner_key,
                round_rating(f64::from(old_winner) + first_delta / 2.0 + second_delta / 2.0),
            );
        }
    }
    Ok(())
}

fn rating_of(buckets: &BucketRegistry, key: &BucketKey) -> i32 {
    buckets.cached(key).map_or(RATING_BASELINE, |bucket| bucket.elo)
}

fn set_rating(buckets: &mut BucketRegistry, key: &BucketKey, value: i32) {
    if let Some(bucket) = buckets.cached_mut(key) {
        bucket.elo = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TourId;
    use crate::store::MemoryStore;

    #[test]
    fn expected_score_is_half_for_equal_ratings() {
        assert!((expected_score(1200, 1200) - 0.5).abs() < f64::EPSILON);
        assert!(expected_score(1400, 1200) > 0.5);
        assert!(expected_score(1200, 1400) < 0.5);
    }

    #[test]
    fn equal_duel_is_exactly_zero_sum() {
        let (winner, loser) = rate_duel(1200, 1200);
        assert_eq!(winner + loser, 2400);
        assert_eq!(winner, 1208);
        assert_eq!(loser, 1192);
    }

    #[test]
    fn duel_sum_drifts_at_most_one_point() {
        for spread in [-350, -120, -33, 0, 47, 200, 399] {
            let winner = 1200 + spread;
            let (new_winner, new_loser) = rate_duel(winner, 1200);
            let drift = (new_winner + new_loser) - (winner + 1200);
            assert!(drift.abs() <= 1, "spread {spread}: drift {drift}");
        }
    }

    fn keys(tour: u32) -> (BucketKey, ObjectId) {
        (
            BucketKey::base(TourId(tour), ObjectId(1)),
            ObjectId(2),
        )
    }

    #[test]
    fn unsplit_settlement_moves_one_k_step() {
        let mut store = MemoryStore::new();
        let mut buckets = BucketRegistry::new();
        let (winner_key, enemy) = keys(1);
        buckets.resolve(&mut store, &winner_key).unwrap();

        settle_victory(
            &mut store,
            &mut buckets,
            &winner_key,
            enemy,
            VariantFilter::NoFilter,
            false,
            false,
        )
        .unwrap();

        let enemy_key = BucketKey::base(TourId(1), enemy);
        assert_eq!(buckets.cached(&winner_key).unwrap().elo, 1208);
        assert_eq!(buckets.cached(&enemy_key).unwrap().elo, 1192);
    }

    #[test]
    fn split_winner_halves_the_enemy_delta() {
        let mut store = MemoryStore::new();
        let mut buckets = BucketRegistry::new();
        let (winner_key, enemy) = keys(1);
        buckets.resolve(&mut store, &winner_key).unwrap();

        settle_victory(
            &mut store,
            &mut buckets,
            &winner_key,
            enemy,
            VariantFilter::NoFilter,
            true,
            false,
        )
        .unwrap();

        let enemy_key = BucketKey::base(TourId(1), enemy);
        assert_eq!(buckets.cached(&winner_key).unwrap().elo, 1208);
        // Full losing delta is -8; the lone enemy bucket takes half.
        assert_eq!(buckets.cached(&enemy_key).unwrap().elo, 1196);
    }

    #[test]
    fn split_enemy_subtype_pass_settles_onto_the_subtype_sibling() {
        let mut store = MemoryStore::new();
        let mut buckets = BucketRegistry::new();
        let (winner_key, enemy) = keys(1);
        buckets.resolve(&mut store, &winner_key).unwrap();

        settle_victory(
            &mut store,
            &mut buckets,
            &winner_key,
            enemy,
            VariantFilter::Bombs,
            true,
            true,
        )
        .unwrap();

        let enemy_base = BucketKey::base(TourId(1), enemy);
        let enemy_subtype = enemy_base.with_filter(VariantFilter::Bombs);
        assert_eq!(buckets.cached(&winner_key).unwrap().elo, 1208);
        assert_eq!(buckets.cached(&enemy_base).unwrap().elo, RATING_BASELINE);
        assert_eq!(buckets.cached(&enemy_subtype).unwrap().elo, 1192);
    }

    #[test]
    fn split_enemy_unsplit_winner_averages_two_duels() {
        let mut store = MemoryStore::new();
        let mut buckets = BucketRegistry::new();
        let (winner_key, enemy) = keys(1);
        buckets.resolve(&mut store, &winner_key).unwrap();

        settle_victory(
            &mut store,
            &mut buckets,
            &winner_key,
            enemy,
            VariantFilter::Bombs,
            false,
            false,
        )
        .unwrap();

        let enemy_base = BucketKey::base(TourId(1), enemy);
        let enemy_subtype = enemy_base.with_filter(VariantFilter::Bombs);
        // Two full duels against 1200-rated siblings, averaged winner delta.
        assert_eq!(buckets.cached(&winner_key).unwrap().elo, 1208);
        assert_eq!(buckets.cached(&enemy_base).unwrap().elo, 1192);
        assert_eq!(buckets.cached(&enemy_subtype).unwrap().elo, 1192);
    }
}
