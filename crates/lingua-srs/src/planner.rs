//! Interval arithmetic for card directions.
//!
//! Everything here is pure: no store, no clock beyond the `now` passed in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lingua_core::error::Result;
use lingua_core::model::{UserCardDirection, MIN_EASE_FACTOR};

/// Ratings offered to the learner and the raw quality each one sends.
pub const AGAIN: u8 = 0;
pub const HARD: u8 = 2;
pub const GOOD: u8 = 4;
pub const EASY: u8 = 5;

/// Highest accepted quality.
pub const MAX_QUALITY: u8 = 5;

/// Interval, in days, each rating would produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intervals {
    pub again: u32,
    pub hard: u32,
    pub good: u32,
    pub easy: u32,
}

/// Quality after discounting the "again" ratings accumulated since the last
/// success. Never below 1 for a success.
pub fn effective_quality(quality: u8, session_attempts: u32) -> u8 {
    if session_attempts <= 2 {
        let discounted = u32::from(quality).saturating_sub(session_attempts);
        discounted.max(1) as u8
    } else {
        quality.min(2)
    }
}

/// Interval after a successful review rated `effective`, never longer than
/// `max_interval` days.
pub fn next_interval(card: &UserCardDirection, effective: u8, max_interval: u32) -> u32 {
    if card.repetitions == 0 {
        let days = match effective {
            5 => 7,
            4 => 3,
            _ => 1,
        };
        return days.min(max_interval.max(1));
    }
    let multiplier = match effective {
        0..=2 => return 1,
        3 => 0.8,
        4 => 1.0,
        _ => 1.3,
    };
    scaled(card.interval, card.ease_factor * multiplier, max_interval)
}

/// SM-2 ease adjustment, floored at [`MIN_EASE_FACTOR`].
pub fn next_ease(ease: f64, effective: u8) -> f64 {
    let miss = 5.0 - f64::from(effective.min(5));
    (ease + (0.1 - miss * (0.08 + miss * 0.02))).max(MIN_EASE_FACTOR)
}

/// Intervals each rating would produce from the card's current state.
///
/// With no failed attempts pending, the fixed preview table applies. After an
/// "again", each rating is run through [`effective_quality`] and
/// [`next_interval`] exactly as a review would.
pub fn plan(card: &UserCardDirection, max_interval: u32) -> Intervals {
    if card.session_attempts > 0 {
        let project = |quality| {
            next_interval(card, effective_quality(quality, card.session_attempts), max_interval)
        };
        return Intervals {
            again: 0,
            hard: project(HARD),
            good: project(GOOD),
            easy: project(EASY),
        };
    }
    if card.repetitions == 0 || card.interval == 0 {
        let cap = max_interval.max(1);
        return Intervals {
            again: 0,
            hard: 1,
            good: 3.min(cap),
            easy: 7.min(cap),
        };
    }
    Intervals {
        again: 0,
        hard: scaled(card.interval, 0.8, max_interval),
        good: scaled(card.interval, card.ease_factor, max_interval),
        easy: scaled(card.interval, card.ease_factor * 1.3, max_interval),
    }
}

/// What [`apply_rating`] did to a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rated {
    /// `None` for an "again".
    pub effective: Option<u8>,
    /// First success on a card that had never been recalled, rated 3 or above.
    pub first_success: bool,
}

/// Apply a review of `quality` to `card` at `now`.
///
/// An "again" only counts the failure: the interval and due date stay put so
/// the card remains due. Any other rating reschedules the card, at most
/// `max_interval` days out. On error the card is left untouched.
pub fn apply_rating(
    card: &mut UserCardDirection,
    quality: u8,
    now: DateTime<Utc>,
    max_interval: u32,
) -> Result<Rated> {
    if quality == AGAIN {
        card.last_reviewed = Some(now);
        card.session_attempts += 1;
        card.incorrect_count += 1;
        return Ok(Rated {
            effective: None,
            first_success: false,
        });
    }

    let effective = effective_quality(quality, card.session_attempts);
    let first_success = card.repetitions == 0 && quality >= 3;
    let mut next = card.clone();
    next.last_reviewed = Some(now);
    next.interval = next_interval(card, effective, max_interval);
    next.ease_factor = next_ease(card.ease_factor, effective);
    next.repetitions += 1;
    next.correct_count += 1;
    next.session_attempts = 0;
    next.next_review = next.schedule_after(now)?;
    *card = next;
    Ok(Rated {
        effective: Some(effective),
        first_success,
    })
}

fn scaled(interval: u32, factor: f64, max_interval: u32) -> u32 {
    let days = (f64::from(interval) * factor).round();
    let cap = max_interval.max(1);
    if days.is_finite() && days >= 1.0 {
        days.min(f64::from(cap)) as u32
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use lingua_core::model::{Direction, DEFAULT_EASE_FACTOR, MAX_INTERVAL_DAYS};

    const MAX: u32 = MAX_INTERVAL_DAYS;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap()
    }

    fn fresh() -> UserCardDirection {
        UserCardDirection::new_card(1, 1, 1, 1, Direction::SourceToTarget, t0())
    }

    fn repeating(interval: u32, ease: f64) -> UserCardDirection {
        let mut card = fresh();
        card.repetitions = 3;
        card.interval = interval;
        card.ease_factor = ease;
        card.last_reviewed = Some(t0());
        card
    }

    #[test]
    fn effective_quality_discounts_attempts() {
        assert_eq!(effective_quality(4, 0), 4);
        assert_eq!(effective_quality(4, 1), 3);
        assert_eq!(effective_quality(5, 2), 3);
        assert_eq!(effective_quality(2, 2), 1);
        assert_eq!(effective_quality(5, 3), 2);
        assert_eq!(effective_quality(1, 7), 1);
    }

    #[test]
    fn new_card_interval_table() {
        let card = fresh();
        assert_eq!(next_interval(&card, 5, MAX), 7);
        assert_eq!(next_interval(&card, 4, MAX), 3);
        assert_eq!(next_interval(&card, 3, MAX), 1);
        assert_eq!(next_interval(&card, 1, MAX), 1);
    }

    #[test]
    fn repeating_card_multipliers() {
        let card = repeating(10, 2.5);
        assert_eq!(next_interval(&card, 5, MAX), 33); // 10 * 2.5 * 1.3 = 32.5
        assert_eq!(next_interval(&card, 4, MAX), 25);
        assert_eq!(next_interval(&card, 3, MAX), 20);
        assert_eq!(next_interval(&card, 2, MAX), 1);
    }

    #[test]
    fn ease_follows_sm2_and_is_floored() {
        assert!((next_ease(2.5, 5) - 2.6).abs() < 1e-9);
        assert!((next_ease(2.5, 4) - 2.5).abs() < 1e-9);
        assert!((next_ease(2.5, 3) - 2.36).abs() < 1e-9);
        assert_eq!(next_ease(1.35, 1), MIN_EASE_FACTOR);
    }

    #[test]
    fn plan_uses_base_table_without_pending_failures() {
        assert_eq!(
            plan(&fresh(), MAX),
            Intervals {
                again: 0,
                hard: 1,
                good: 3,
                easy: 7
            }
        );
        assert_eq!(
            plan(&repeating(10, 2.0), MAX),
            Intervals {
                again: 0,
                hard: 8,
                good: 20,
                easy: 26
            }
        );
        assert_eq!(plan(&repeating(1, 1.3), MAX).hard, 1);
    }

    #[test]
    fn plan_after_again_matches_review() {
        let mut card = fresh();
        apply_rating(&mut card, AGAIN, t0(), MAX).unwrap();
        let preview = plan(&card, MAX);
        assert_eq!(preview.good, 1); // effective max(1, 4 - 1) = 3
        assert_eq!(preview.easy, 3); // effective 4

        let mut reviewed = card.clone();
        apply_rating(&mut reviewed, GOOD, t0(), MAX).unwrap();
        assert_eq!(reviewed.interval, preview.good);
    }

    #[test]
    fn again_keeps_schedule() {
        let mut card = repeating(6, 2.2);
        card.next_review = t0();
        let later = t0() + Duration::hours(2);
        let rated = apply_rating(&mut card, AGAIN, later, MAX).unwrap();
        assert_eq!(rated.effective, None);
        assert_eq!(card.interval, 6);
        assert_eq!(card.next_review, t0());
        assert_eq!(card.session_attempts, 1);
        assert_eq!(card.incorrect_count, 1);
        assert_eq!(card.last_reviewed, Some(later));
    }

    #[test]
    fn again_then_good_on_new_card() {
        let mut card = fresh();
        assert_eq!(card.ease_factor, DEFAULT_EASE_FACTOR);
        apply_rating(&mut card, AGAIN, t0(), MAX).unwrap();
        assert_eq!(card.interval, 0);
        assert_eq!(card.session_attempts, 1);

        let t1 = t0() + Duration::minutes(1);
        let rated = apply_rating(&mut card, GOOD, t1, MAX).unwrap();
        assert_eq!(rated.effective, Some(3));
        assert!(rated.first_success);
        assert_eq!(card.interval, 1);
        assert_eq!(card.repetitions, 1);
        assert_eq!(card.session_attempts, 0);
        assert_eq!(card.next_review, t1 + Duration::days(1));
        assert!((card.ease_factor - 2.36).abs() < 1e-9);
        assert!(card.next_review > card.last_reviewed.unwrap());
    }

    #[test]
    fn hard_first_review_is_not_first_success() {
        let mut card = fresh();
        let rated = apply_rating(&mut card, HARD, t0(), MAX).unwrap();
        assert!(!rated.first_success);
        assert_eq!(card.interval, 1);
        assert_eq!(card.repetitions, 1);
    }

    #[test]
    fn ease_never_drops_below_floor() {
        let mut card = repeating(3, MIN_EASE_FACTOR);
        for _ in 0..3 {
            apply_rating(&mut card, AGAIN, t0(), MAX).unwrap();
        }
        apply_rating(&mut card, EASY, t0(), MAX).unwrap();
        assert!(card.ease_factor >= MIN_EASE_FACTOR);
        assert_eq!(card.interval, 1);
    }

    #[test]
    fn repeated_easy_ratings_stay_within_cap() {
        let mut card = fresh();
        let mut now = t0();
        for _ in 0..20 {
            apply_rating(&mut card, EASY, now, MAX).unwrap();
            assert!(card.interval <= MAX);
            assert!(card.next_review > now);
            now = card.next_review;
        }
        assert_eq!(card.interval, MAX);
        assert_eq!(card.repetitions, 20);
    }

    #[test]
    fn configured_cap_bounds_intervals_and_preview() {
        let card = repeating(300, 2.5);
        assert_eq!(next_interval(&card, 5, 365), 365);
        assert_eq!(plan(&card, 365), Intervals { again: 0, hard: 240, good: 365, easy: 365 });
        assert_eq!(plan(&fresh(), 2).easy, 2);
    }

    #[test]
    fn oversized_stored_interval_is_capped() {
        let mut card = repeating(u32::MAX, 2.5);
        apply_rating(&mut card, GOOD, t0(), MAX).unwrap();
        assert_eq!(card.interval, MAX);
        assert_eq!(card.next_review, t0() + Duration::days(i64::from(MAX)));
    }

    #[test]
    fn calendar_overflow_leaves_card_untouched() {
        let mut card = repeating(u32::MAX, 2.5);
        let before = card.clone();
        let err = apply_rating(&mut card, GOOD, t0(), u32::MAX).unwrap_err();
        assert!(matches!(err, lingua_core::error::CoreError::InvariantViolation(_)));
        assert_eq!(card, before);
    }
}
