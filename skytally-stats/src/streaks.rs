//! Streak and best-single-sortie tracking for pilot buckets, with
//! propagation into the pilot-less aggregate bucket.

use crate::model::BucketKey;
use crate::registry::BucketRegistry;
use crate::sortie::Sortie;
use crate::store::StatsStore;

/// Fold one sortie into the pilot bucket's streak state and best-sortie
/// records, then raise the pilot-less aggregate's historical maxima where
/// this pilot now exceeds them.
///
/// Current streaks reset to zero when the sortie ended in a pilot
/// death-and-respawn. Historical maxima and bests only ever increase; the
/// aggregate bucket records which pilot and sortie achieved each of them.
///
/// # Errors
///
/// Returns the store's error if resolving the aggregate sibling fails.
pub fn process_streaks_and_bests<S: StatsStore>(
    store: &mut S,
    buckets: &mut BucketRegistry,
    pilot_key: &BucketKey,
    sortie: &Sortie,
) -> Result<(), S::Error> {
    let (max_score_streak, max_ak_streak, max_gk_streak) = {
        let bucket = buckets.resolve(store, pilot_key)?;

        bucket.current_score_streak += sortie.score;
        bucket.current_ak_streak += sortie.ak_total;
        bucket.current_gk_streak += sortie.gk_total;

        bucket.max_score_streak = bucket.max_score_streak.max(bucket.current_score_streak);
        bucket.max_ak_streak = bucket.max_ak_streak.max(bucket.current_ak_streak);
        bucket.max_gk_streak = bucket.max_gk_streak.max(bucket.current_gk_streak);

        if sortie.score > bucket.best_score_in_sortie {
            bucket.best_score_in_sortie = sortie.score;
            bucket.best_score_sortie = Some(sortie.id);
        }
        if sortie.ak_total > bucket.best_ak_in_sortie {
            bucket.best_ak_in_sortie = sortie.ak_total;
            bucket.best_ak_sortie = Some(sortie.id);
        }
        if sortie.gk_total > bucket.best_gk_in_sortie {
            bucket.best_gk_in_sortie = sortie.gk_total;
            bucket.best_gk_sortie = Some(sortie.id);
        }

        if sortie.outcome.relive {
            bucket.current_score_streak = 0;
            bucket.current_ak_streak = 0;
            bucket.current_gk_streak = 0;
        }

        (
            bucket.max_score_streak,
            bucket.max_ak_streak,
            bucket.max_gk_streak,
        )
    };

    let aggregate_key = pilot_key.without_pilot();
    let aggregate = buckets.resolve(store, &aggregate_key)?;

    if max_score_streak > aggregate.max_score_streak {
        aggregate.max_score_streak = max_score_streak;
        aggregate.max_score_streak_pilot = sortie.pilot;
    }
    if max_ak_streak > aggregate.max_ak_streak {
        aggregate.max_ak_streak = max_ak_streak;
        aggregate.max_ak_streak_pilot = sortie.pilot;
    }
    if max_gk_streak > aggregate.max_gk_streak {
        aggregate.max_gk_streak = max_gk_streak;
        aggregate.max_gk_streak_pilot = sortie.pilot;
    }

    if sortie.score > aggregate.best_score_in_sortie {
        aggregate.best_score_in_sortie = sortie.score;
        aggregate.best_score_sortie = Some(sortie.id);
    }
    if sortie.ak_total > aggregate.best_ak_in_sortie {
        aggregate.best_ak_in_sortie = sortie.ak_total;
        aggregate.best_ak_sortie = Some(sortie.id);
    }
    if sortie.gk_total > aggregate.best_gk_in_sortie {
        aggregate.best_gk_in_sortie = sortie.gk_total;
        aggregate.best_gk_sortie = Some(sortie.id);
    }

    Ok(())
}
