//! Processing a single card rating.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use lingua_core::access::AccessGatekeeper;
use lingua_core::error::{CoreError, Result};
use lingua_core::model::{
    Direction, LessonId, LessonKind, LessonProgress, ProgressStatus, UserCardDirection, UserId,
    UserWord, WordId, WordStatus, MIN_EASE_FACTOR,
};
use lingua_core::progress::{apply_update, ProgressRecorder, ProgressUpdate};
use lingua_core::progress_data::{SessionStats, StudiedCard, StudiedStatus};
use lingua_core::services::{retry_on_conflict, Services};
use lingua_core::statistics::MATURE_INTERVAL_DAYS;
use lingua_core::traits::{Sequence, Transaction};

use crate::planner::{apply_rating, plan, Intervals, MAX_QUALITY};
use crate::selector::{select_cards, CardSelector};

/// A learner's rating of one card direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewInput {
    pub word_id: WordId,
    pub direction: Direction,
    pub quality: u8,
    #[serde(default)]
    pub time_spent: Option<u32>,
    #[serde(default)]
    pub user_answer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewResponse {
    pub success: bool,
    pub interval: u32,
    pub next_review: DateTime<Utc>,
    pub calculated_intervals: Intervals,
    pub daily_stats: SessionStats,
    /// Set for successful ratings only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson_complete: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_cards: Option<u32>,
    pub card: UserCardDirection,
}

#[derive(Clone)]
pub struct ReviewProcessor {
    services: Services,
    recorder: ProgressRecorder,
    gate: AccessGatekeeper,
    selector: CardSelector,
}

impl ReviewProcessor {
    pub fn new(services: Services) -> Self {
        Self {
            recorder: ProgressRecorder::new(services.clone()),
            gate: AccessGatekeeper::new(services.clone()),
            selector: CardSelector::new(services.clone()),
            services,
        }
    }

    /// Rate one card direction within card lesson `lesson_id`.
    ///
    /// The card, any newly unlocked opposite direction and the lesson
    /// progress are committed together. When a successful rating leaves the
    /// working set empty, the lesson completes with the session accuracy.
    pub async fn review(
        &self,
        user: UserId,
        lesson_id: LessonId,
        input: ReviewInput,
    ) -> Result<ReviewResponse> {
        if input.quality > MAX_QUALITY {
            return Err(CoreError::InvalidInput(format!(
                "quality must be between 0 and {MAX_QUALITY}, got {}",
                input.quality
            )));
        }
        let lesson = self.selector.card_lesson(lesson_id).await?;
        let store = &self.services.store;
        if store.word(input.word_id).await?.is_none() {
            return Err(CoreError::not_found("word", input.word_id));
        }

        let _guard = self.services.locks.lock(user, lesson_id).await;
        if store.progress(user, lesson_id).await?.is_none() {
            self.gate.check_entry(user, &lesson).await?;
        }
        let limits = self.selector.limits(user, &lesson).await?;
        let max_interval = self.services.config.srs.max_interval_days;

        let (lesson, input, limits) = (&lesson, &input, &limits);
        let (card, progress, remaining, completed_now) =
            retry_on_conflict("review", || async move {
                let now = self.services.now();
                let mut progress = self.recorder.load_or_start(user, lesson, now).await?;
                let mut tx = Transaction::new();

                let mut user_word = match store.user_word(user, input.word_id).await? {
                    Some(existing) => existing,
                    None => UserWord {
                        id: store.next_id(Sequence::UserWord).await?,
                        user_id: user,
                        word_id: input.word_id,
                        status: WordStatus::New,
                        created_at: now,
                        version: 0,
                    },
                };
                let mut card = match store
                    .card_direction(user, input.word_id, input.direction)
                    .await?
                {
                    Some(existing) => existing,
                    None => UserCardDirection::new_card(
                        store.next_id(Sequence::CardDirection).await?,
                        user,
                        user_word.id,
                        input.word_id,
                        input.direction,
                        now,
                    ),
                };

                let previous = progress.data.studied_card(card.id).cloned();
                let was_new = previous.as_ref().map_or(card.is_new(), |s| s.was_new);
                let prior_attempts = previous.as_ref().map_or(0, |s| s.attempts);

                let rated = apply_rating(&mut card, input.quality, now, max_interval)?;
                if card.repetitions > 0 && card.ease_factor < MIN_EASE_FACTOR {
                    return Err(CoreError::InvariantViolation(format!(
                        "card {} ease factor {} below minimum",
                        card.id, card.ease_factor
                    )));
                }

                let mut opposite = None;
                if rated.first_success
                    && store
                        .card_direction(user, input.word_id, input.direction.opposite())
                        .await?
                        .is_none()
                {
                    opposite = Some(UserCardDirection::new_card(
                        store.next_id(Sequence::CardDirection).await?,
                        user,
                        user_word.id,
                        input.word_id,
                        input.direction.opposite(),
                        now,
                    ));
                }

                let status = word_status(&user_word, &card, rated.effective.is_some());
                if status != user_word.status || user_word.version == 0 {
                    user_word.status = status;
                    tx.put_user_word(user_word.clone());
                }

                let studied = match rated.effective {
                    None => StudiedCard {
                        status: StudiedStatus::Failed,
                        was_new,
                        attempts: prior_attempts + 1,
                        effective_rating: None,
                    },
                    Some(effective) => StudiedCard {
                        status: StudiedStatus::Passed,
                        was_new,
                        attempts: prior_attempts,
                        effective_rating: Some(effective),
                    },
                };
                progress.data.record_card(card.id, studied, input.quality);
                let mut update = ProgressUpdate {
                    data: Some(progress.data.clone()),
                    ..ProgressUpdate::default()
                };

                let mut remaining = None;
                if rated.effective.is_some() {
                    let mut inventory = store.card_directions(user).await?;
                    for fresh in std::iter::once(&card).chain(opposite.as_ref()) {
                        match inventory.iter_mut().find(|c| c.id == fresh.id) {
                            Some(slot) => *slot = fresh.clone(),
                            None => inventory.push(fresh.clone()),
                        }
                    }
                    let studied_cards = progress.data.studied_cards().cloned().unwrap_or_default();
                    let left = select_cards(&inventory, &studied_cards, limits, now).len() as u32;
                    if left == 0 && !progress.is_completed() {
                        let accuracy = progress
                            .data
                            .session_stats()
                            .map_or(0.0, SessionStats::accuracy);
                        update.status = Some(ProgressStatus::Completed);
                        update.score = Some(accuracy);
                    }
                    remaining = Some(left);
                }
                let completed_now = apply_update(&mut progress, &update, now)?;

                tx.put_card_direction(card.clone());
                if let Some(opposite) = opposite {
                    tx.put_card_direction(opposite);
                }
                tx.put_progress(progress.clone());
                store.commit(tx).await?;
                card.version += 1;
                progress.version += 1;
                Ok((card, progress, remaining, completed_now))
            })
            .await?;

        debug!(
            user,
            lesson = lesson.id,
            direction = card.id,
            quality = input.quality,
            interval = card.interval,
            "card reviewed"
        );
        self.services.observer.on_card_reviewed(&card, input.quality);
        if completed_now {
            info!(user, lesson = lesson.id, score = progress.score, "card lesson finished");
            self.recorder.on_completed(&progress, LessonKind::Card).await;
        }

        Ok(review_response(&card, &progress, remaining, max_interval))
    }
}

fn review_response(
    card: &UserCardDirection,
    progress: &LessonProgress,
    remaining: Option<u32>,
    max_interval: u32,
) -> ReviewResponse {
    ReviewResponse {
        success: true,
        interval: card.interval,
        next_review: card.next_review,
        calculated_intervals: plan(card, max_interval),
        daily_stats: progress.data.session_stats().cloned().unwrap_or_default(),
        lesson_complete: remaining.map(|_| progress.is_completed()),
        remaining_cards: remaining,
        card: card.clone(),
    }
}

/// Word status after a review: learning once seen, review once the rated
/// direction has matured.
fn word_status(user_word: &UserWord, card: &UserCardDirection, success: bool) -> WordStatus {
    if success && card.interval >= MATURE_INTERVAL_DAYS {
        WordStatus::Review
    } else if user_word.status == WordStatus::New {
        WordStatus::Learning
    } else {
        user_word.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use lingua_core::memory::MemoryStore;
    use lingua_core::model::{Lesson, Module, Word, MAX_INTERVAL_DAYS};
    use lingua_core::traits::{Clock, ManualClock, Store};
    use serde_json::json;
    use std::sync::Arc;

    use crate::planner::{AGAIN, EASY, GOOD};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 10, 0, 0).unwrap()
    }

    async fn setup(words: &[(&str, &str)]) -> (ReviewProcessor, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        store
            .put_module(Module {
                id: 1,
                level: "A1".into(),
                number: 1,
                title: "Basics".into(),
                description: String::new(),
                prerequisites: Vec::new(),
                raw_content: None,
            })
            .await
            .unwrap();
        let mut ids = Vec::new();
        for (english, russian) in words {
            let word = store
                .put_word(Word {
                    id: 0,
                    english: english.to_string(),
                    russian: russian.to_string(),
                    audio: None,
                    examples: Vec::new(),
                })
                .await
                .unwrap();
            ids.push(word.id);
        }
        store
            .put_lesson(Lesson {
                id: 10,
                module_id: 1,
                number: 1,
                order: 1,
                kind: LessonKind::Card,
                title: "Cards".into(),
                content: json!({ "words": ids }),
                min_cards_required: None,
                min_accuracy_required: None,
            })
            .await
            .unwrap();
        let clock = Arc::new(ManualClock::new(t0()));
        let services = Services::new(store.clone()).with_clock(clock.clone());
        (ReviewProcessor::new(services), store, clock)
    }

    fn rate(word_id: WordId, direction: Direction, quality: u8) -> ReviewInput {
        ReviewInput {
            word_id,
            direction,
            quality,
            time_spent: None,
            user_answer: None,
        }
    }

    #[tokio::test]
    async fn again_then_good() {
        let (processor, store, clock) = setup(&[("cat", "кошка"), ("dog", "собака")]).await;

        let first = processor
            .review(7, 10, rate(1, Direction::SourceToTarget, AGAIN))
            .await
            .unwrap();
        assert_eq!(first.interval, 0);
        assert_eq!(first.card.session_attempts, 1);
        assert_eq!(first.card.incorrect_count, 1);
        assert_eq!(first.card.last_reviewed, Some(t0()));
        assert_eq!(first.lesson_complete, None);
        assert_eq!(first.calculated_intervals.good, 1);

        clock.advance(Duration::minutes(1));
        let t1 = t0() + Duration::minutes(1);
        let second = processor
            .review(7, 10, rate(1, Direction::SourceToTarget, GOOD))
            .await
            .unwrap();
        assert_eq!(second.interval, 1);
        assert_eq!(second.card.repetitions, 1);
        assert_eq!(second.card.session_attempts, 0);
        assert_eq!(second.next_review, t1 + Duration::days(1));
        assert!((second.card.ease_factor - 2.36).abs() < 1e-9);
        assert_eq!(second.daily_stats.reviews, 2);
        assert_eq!(second.daily_stats.again, 1);

        // First success unlocks the opposite direction.
        let reverse = store
            .card_direction(7, 1, Direction::TargetToSource)
            .await
            .unwrap()
            .unwrap();
        assert!(reverse.is_new());

        let progress = store.progress(7, 10).await.unwrap().unwrap();
        let studied = progress.data.studied_card(second.card.id).unwrap();
        assert_eq!(studied.status, StudiedStatus::Passed);
        assert!(studied.was_new);
        assert_eq!(studied.attempts, 1);
        assert_eq!(studied.effective_rating, Some(3));

        let word = store.user_word(7, 1).await.unwrap().unwrap();
        assert_eq!(word.status, WordStatus::Learning);
    }

    #[tokio::test]
    async fn lesson_completes_when_working_set_empties() {
        let (processor, store, _) = setup(&[("cat", "кошка")]).await;

        let first = processor
            .review(7, 10, rate(1, Direction::SourceToTarget, EASY))
            .await
            .unwrap();
        assert_eq!(first.interval, 7);
        // The reverse direction is now new and still to be studied.
        assert_eq!(first.remaining_cards, Some(1));
        assert_eq!(first.lesson_complete, Some(false));

        let last = processor
            .review(7, 10, rate(1, Direction::TargetToSource, GOOD))
            .await
            .unwrap();
        assert_eq!(last.remaining_cards, Some(0));
        assert_eq!(last.lesson_complete, Some(true));

        let progress = store.progress(7, 10).await.unwrap().unwrap();
        assert_eq!(progress.status, ProgressStatus::Completed);
        assert_eq!(progress.score, 100.0);
        assert!(progress.completed_at.is_some());
        // Card lessons are worth 25 XP, doubled at 90% and above.
        assert_eq!(store.user_xp(7).await.unwrap().total_xp, 50);
    }

    #[tokio::test]
    async fn quality_above_five_is_rejected() {
        let (processor, store, _) = setup(&[("cat", "кошка")]).await;
        let err = processor
            .review(7, 10, rate(1, Direction::SourceToTarget, 6))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
        assert!(store.progress(7, 10).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_word_is_not_found() {
        let (processor, _, _) = setup(&[("cat", "кошка")]).await;
        let err = processor
            .review(7, 10, rate(99, Direction::SourceToTarget, GOOD))
            .await
            .unwrap_err();
        assert_eq!(err, CoreError::not_found("word", 99));
    }

    #[tokio::test]
    async fn repeated_again_keeps_card_due() {
        let (processor, store, clock) = setup(&[("cat", "кошка")]).await;
        for _ in 0..3 {
            processor
                .review(7, 10, rate(1, Direction::SourceToTarget, AGAIN))
                .await
                .unwrap();
            clock.advance(Duration::seconds(30));
        }
        let card = store
            .card_direction(7, 1, Direction::SourceToTarget)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(card.session_attempts, 3);
        assert_eq!(card.interval, 0);
        assert!(card.is_due(clock.now()));
        let progress = store.progress(7, 10).await.unwrap().unwrap();
        assert_eq!(progress.data.studied_card(card.id).unwrap().attempts, 3);
        assert_eq!(progress.status, ProgressStatus::InProgress);
    }

    #[tokio::test]
    async fn repeated_easy_reviews_stay_schedulable() {
        let (processor, store, clock) = setup(&[("cat", "кошка")]).await;
        for _ in 0..20 {
            let response = processor
                .review(7, 10, rate(1, Direction::SourceToTarget, EASY))
                .await
                .unwrap();
            assert!(response.interval <= MAX_INTERVAL_DAYS);
            assert!(response.calculated_intervals.easy <= MAX_INTERVAL_DAYS);
            clock.set(response.next_review);
        }
        let card = store
            .card_direction(7, 1, Direction::SourceToTarget)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(card.interval, MAX_INTERVAL_DAYS);
        assert_eq!(card.repetitions, 20);
    }

    #[tokio::test]
    async fn configured_interval_cap_applies() {
        let (_, store, clock) = setup(&[("cat", "кошка")]).await;
        let mut config = lingua_core::config::LinguaConfig::default();
        config.srs.max_interval_days = 30;
        let services = Services::new(store.clone())
            .with_clock(clock.clone())
            .with_config(config);
        let processor = ReviewProcessor::new(services);

        let mut last = None;
        for _ in 0..4 {
            let response = processor
                .review(7, 10, rate(1, Direction::SourceToTarget, EASY))
                .await
                .unwrap();
            clock.set(response.next_review);
            last = Some(response);
        }
        let last = last.unwrap();
        assert_eq!(last.interval, 30);
        assert_eq!(last.calculated_intervals.easy, 30);
    }
}
