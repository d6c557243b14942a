//! Choosing the cards a learner sees in a card lesson session.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use lingua_core::access::AccessGatekeeper;
use lingua_core::content::{CardWord, LessonContent};
use lingua_core::error::{CoreError, Result};
use lingua_core::model::{
    Direction, Lesson, LessonId, LessonKind, UserCardDirection, UserId, UserWord, WordId,
    WordStatus,
};
use lingua_core::progress_data::{StudiedCard, StudiedStatus};
use lingua_core::schema::validate_lesson;
use lingua_core::services::{retry_on_conflict, Services};
use lingua_core::traits::{Sequence, Transaction};

use crate::humanize::humanize_until;
use crate::planner::{plan, Intervals};
use crate::shuffle::smart_shuffle;

/// Caps and completion criteria in force for one card lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrsLimits {
    pub new_cards: u32,
    pub reviews: u32,
    /// Fixed per-lesson caps instead of the learner's daily settings.
    pub concentrated: bool,
    pub min_cards_required: u32,
    pub min_accuracy_required: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionStats {
    pub new_cards: u32,
    pub review_cards: u32,
    pub new_cards_passed: u32,
    pub review_cards_passed: u32,
    pub new_limit: u32,
    pub review_limit: u32,
}

/// One card direction ready to show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DueCard {
    pub direction_id: i64,
    pub word_id: WordId,
    pub user_word_id: i64,
    pub direction: Direction,
    pub prompt: String,
    pub answer: String,
    #[serde(default)]
    pub audio: Option<String>,
    #[serde(default)]
    pub examples: Vec<String>,
    pub is_new: bool,
    pub repetitions: u32,
    pub interval: u32,
    pub ease_factor: f64,
    pub next_review: DateTime<Utc>,
    pub intervals: Intervals,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingSet {
    pub cards: Vec<DueCard>,
    /// Cards eligible this session before caps.
    pub total_due: u32,
    pub stats: SelectionStats,
    pub srs_settings: SrsLimits,
    /// Wording for the next due card, only when `cards` is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_review_time: Option<String>,
}

/// Output of [`select_cards`]: reviews first, then new cards, not yet shuffled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub reviews: Vec<UserCardDirection>,
    pub new: Vec<UserCardDirection>,
    pub total_due: u32,
    pub stats: SelectionStats,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.reviews.is_empty() && self.new.is_empty()
    }

    pub fn len(&self) -> usize {
        self.reviews.len() + self.new.len()
    }
}

/// Pick due reviews and new cards from `inventory`, skipping every direction
/// already studied in this session. Passed cards use up the caps.
pub fn select_cards(
    inventory: &[UserCardDirection],
    studied: &BTreeMap<String, StudiedCard>,
    limits: &SrsLimits,
    now: DateTime<Utc>,
) -> Selection {
    let passed = |was_new: bool| {
        studied
            .values()
            .filter(|s| s.status == StudiedStatus::Passed && s.was_new == was_new)
            .count() as u32
    };
    let new_passed = passed(true);
    let review_passed = passed(false);
    let unseen = |card: &&UserCardDirection| !studied.contains_key(&card.id.to_string());

    let mut due_reviews: Vec<&UserCardDirection> = inventory
        .iter()
        .filter(unseen)
        .filter(|c| c.last_reviewed.is_some() && c.is_due(now))
        .collect();
    due_reviews.sort_by_key(|c| (c.next_review, c.id));

    let mut fresh: Vec<&UserCardDirection> = inventory
        .iter()
        .filter(unseen)
        .filter(|c| c.last_reviewed.is_none() && c.repetitions == 0)
        .collect();
    fresh.sort_by_key(|c| c.id);

    let total_due = (due_reviews.len() + fresh.len()) as u32;
    let review_room = limits.reviews.saturating_sub(review_passed) as usize;
    let new_room = limits.new_cards.saturating_sub(new_passed) as usize;
    let reviews: Vec<UserCardDirection> =
        due_reviews.into_iter().take(review_room).cloned().collect();
    let new: Vec<UserCardDirection> = fresh.into_iter().take(new_room).cloned().collect();

    Selection {
        stats: SelectionStats {
            new_cards: new.len() as u32,
            review_cards: reviews.len() as u32,
            new_cards_passed: new_passed,
            review_cards_passed: review_passed,
            new_limit: limits.new_cards,
            review_limit: limits.reviews,
        },
        reviews,
        new,
        total_due,
    }
}

/// Builds working sets for card lessons.
#[derive(Clone)]
pub struct CardSelector {
    services: Services,
    gate: AccessGatekeeper,
    seed: Option<u64>,
}

impl CardSelector {
    pub fn new(services: Services) -> Self {
        Self {
            gate: AccessGatekeeper::new(services.clone()),
            services,
            seed: None,
        }
    }

    /// Shuffle with a fixed seed, for reproducible sessions.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// The cards to show for `lesson_id` right now.
    ///
    /// Words the lesson introduces are added to the learner's inventory first.
    pub async fn working_set(&self, user: UserId, lesson_id: LessonId) -> Result<WorkingSet> {
        let lesson = self.card_lesson(lesson_id).await?;
        let _guard = self.services.locks.lock(user, lesson_id).await;
        let store = &self.services.store;

        let progress = store.progress(user, lesson_id).await?;
        if progress.is_none() {
            self.gate.check_entry(user, &lesson).await?;
        }
        self.introduce_words(user, &lesson).await?;

        let now = self.services.now();
        let limits = self.limits(user, &lesson).await?;
        let inventory = store.card_directions(user).await?;
        let empty = BTreeMap::new();
        let studied = progress
            .as_ref()
            .and_then(|p| p.data.studied_cards())
            .unwrap_or(&empty);
        let selection = select_cards(&inventory, studied, &limits, now);
        debug!(
            user,
            lesson = lesson_id,
            reviews = selection.reviews.len(),
            new = selection.new.len(),
            "working set selected"
        );

        let Selection {
            reviews,
            new,
            total_due,
            stats,
        } = selection;
        let ordered = smart_shuffle(
            reviews.into_iter().chain(new).collect(),
            |c| c.word_id,
            &mut self.rng(),
        );

        let mut cards = Vec::with_capacity(ordered.len());
        for card in &ordered {
            let Some(word) = store.word(card.word_id).await? else {
                warn!(word = card.word_id, direction = card.id, "card without a word, skipped");
                continue;
            };
            let (prompt, answer) = match card.direction {
                Direction::SourceToTarget => (word.english.clone(), word.russian.clone()),
                Direction::TargetToSource => (word.russian.clone(), word.english.clone()),
            };
            cards.push(DueCard {
                direction_id: card.id,
                word_id: card.word_id,
                user_word_id: card.user_word_id,
                direction: card.direction,
                prompt,
                answer,
                audio: word.audio.clone(),
                examples: word.examples.clone(),
                is_new: card.is_new(),
                repetitions: card.repetitions,
                interval: card.interval,
                ease_factor: card.ease_factor,
                next_review: card.next_review,
                intervals: plan(card, self.services.config.srs.max_interval_days),
            });
        }

        let next_review_time = if cards.is_empty() {
            inventory
                .iter()
                .map(|c| c.next_review)
                .filter(|at| *at > now)
                .min()
                .map(|at| humanize_until(now, at))
        } else {
            None
        };

        Ok(WorkingSet {
            cards,
            total_due,
            stats,
            srs_settings: limits,
            next_review_time,
        })
    }

    /// Caps for `lesson`: fixed for concentrated lessons, otherwise the
    /// learner's daily settings.
    pub async fn limits(&self, user: UserId, lesson: &Lesson) -> Result<SrsLimits> {
        let srs = &self.services.config.srs;
        let concentrated = srs.is_concentrated(lesson.number);
        let (new_cards, reviews) = if concentrated {
            (srs.concentrated_new_cap, srs.concentrated_review_cap)
        } else {
            let settings = self.services.user_settings(user).await?;
            (settings.new_words_per_day, settings.reviews_per_day)
        };
        Ok(SrsLimits {
            new_cards,
            reviews,
            concentrated,
            min_cards_required: lesson
                .min_cards_required
                .unwrap_or(srs.default_min_cards_required),
            min_accuracy_required: lesson
                .min_accuracy_required
                .unwrap_or(srs.default_min_accuracy_required),
        })
    }

    /// Fetch `lesson_id` and make sure it is a card lesson.
    pub(crate) async fn card_lesson(&self, lesson_id: LessonId) -> Result<Lesson> {
        let lesson = self.services.lesson(lesson_id).await?;
        if lesson.kind != LessonKind::Card {
            return Err(CoreError::InvalidInput(format!(
                "lesson {lesson_id} is a {} lesson, not a card lesson",
                lesson.kind
            )));
        }
        Ok(lesson)
    }

    /// Add the lesson's words the learner does not know yet, each with its
    /// source-to-target direction. Returns how many were added.
    async fn introduce_words(&self, user: UserId, lesson: &Lesson) -> Result<usize> {
        let LessonContent::Card(content) = validate_lesson(lesson)? else {
            return Ok(0);
        };
        let store = &self.services.store;

        let mut word_ids = Vec::new();
        for entry in &content.words {
            let found = match entry {
                CardWord::Id(id) => store.word(*id).await?,
                CardWord::Item(item) => match item.word_id {
                    Some(id) => store.word(id).await?,
                    None => store.word_by_english(&item.word).await?,
                },
            };
            match found {
                Some(word) if !word_ids.contains(&word.id) => word_ids.push(word.id),
                Some(_) => {}
                None => warn!(lesson = lesson.id, ?entry, "card word not in the store, skipped"),
            }
        }
        if word_ids.is_empty() {
            return Ok(0);
        }

        let word_ids = &word_ids;
        retry_on_conflict("introduce_words", || async move {
            let now = self.services.now();
            let mut tx = Transaction::new();
            let mut added = 0;
            for &word_id in word_ids {
                if store.user_word(user, word_id).await?.is_some() {
                    continue;
                }
                let user_word = UserWord {
                    id: store.next_id(Sequence::UserWord).await?,
                    user_id: user,
                    word_id,
                    status: WordStatus::New,
                    created_at: now,
                    version: 0,
                };
                let card = UserCardDirection::new_card(
                    store.next_id(Sequence::CardDirection).await?,
                    user,
                    user_word.id,
                    word_id,
                    Direction::SourceToTarget,
                    now,
                );
                tx.put_user_word(user_word).put_card_direction(card);
                added += 1;
            }
            if !tx.is_empty() {
                store.commit(tx).await?;
                debug!(user, lesson = lesson.id, added, "words introduced");
            }
            Ok(added)
        })
        .await
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}
