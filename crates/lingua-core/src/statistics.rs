//! Aggregate statistics over attempts, progress and card directions.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    is_mastered, LessonAttempt, LessonId, LessonProgress, ProgressStatus, UserCardDirection, UserId,
};
use crate::services::Services;

/// Interval, in days, from which a card direction counts as mature.
pub const MATURE_INTERVAL_DAYS: u32 = 21;

// ---------------------------------------------------------------------------
// Attempts
// ---------------------------------------------------------------------------

/// Summary of a learner's attempts at one lesson.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LessonStats {
    pub attempts: u32,
    pub best_score: f64,
    pub average_score: f64,
    pub last_score: f64,
    /// Fraction of attempts that passed, in [0, 1].
    pub pass_rate: f64,
    /// 1-based number of the first passing attempt.
    pub first_pass: Option<u32>,
}

impl LessonStats {
    /// Attempts are read in attempt-number order regardless of input order.
    pub fn from_attempts(attempts: &[LessonAttempt]) -> Self {
        if attempts.is_empty() {
            return Self::default();
        }
        let mut ordered: Vec<&LessonAttempt> = attempts.iter().collect();
        ordered.sort_by_key(|a| a.attempt_number);

        let n = ordered.len() as f64;
        let passed = ordered.iter().filter(|a| a.passed).count() as f64;
        Self {
            attempts: ordered.len() as u32,
            best_score: ordered.iter().map(|a| a.score).fold(0.0, f64::max),
            average_score: ordered.iter().map(|a| a.score).sum::<f64>() / n,
            last_score: ordered.last().map_or(0.0, |a| a.score),
            pass_rate: passed / n,
            first_pass: ordered.iter().find(|a| a.passed).map(|a| a.attempt_number),
        }
    }
}

/// How often one exercise was answered wrongly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MistakeCount {
    pub index: String,
    pub count: u32,
}

/// Exercise indices ranked by how often they were missed, most frequent first.
pub fn mistake_summary(attempts: &[LessonAttempt]) -> Vec<MistakeCount> {
    let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
    for mistake in attempts.iter().flat_map(|a| &a.mistakes) {
        *counts.entry(mistake.index.as_str()).or_default() += 1;
    }
    let mut ranked: Vec<MistakeCount> = counts
        .into_iter()
        .map(|(index, count)| MistakeCount {
            index: index.to_string(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked
}

// ---------------------------------------------------------------------------
// Cards
// ---------------------------------------------------------------------------

/// Snapshot of a learner's card inventory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SrsStats {
    pub total: u32,
    pub new: u32,
    pub learning: u32,
    pub mature: u32,
    /// Distinct words whose every direction reached the mastery interval.
    pub mastered_words: u32,
    pub due_now: u32,
    /// Lifetime share of correct reviews, in percent.
    pub accuracy: f64,
}

impl SrsStats {
    pub fn compute(cards: &[UserCardDirection], now: DateTime<Utc>, mastery_days: u32) -> Self {
        let mut stats = SrsStats {
            total: cards.len() as u32,
            ..Default::default()
        };
        let mut by_word: HashMap<i64, Vec<&UserCardDirection>> = HashMap::new();
        let (mut correct, mut incorrect) = (0u64, 0u64);

        for card in cards {
            if card.is_new() {
                stats.new += 1;
            } else if card.interval >= MATURE_INTERVAL_DAYS {
                stats.mature += 1;
            } else {
                stats.learning += 1;
            }
            if card.is_due(now) {
                stats.due_now += 1;
            }
            correct += u64::from(card.correct_count);
            incorrect += u64::from(card.incorrect_count);
            by_word.entry(card.word_id).or_default().push(card);
        }

        stats.mastered_words = by_word
            .values()
            .filter(|dirs| is_mastered(dirs.iter().copied(), mastery_days))
            .count() as u32;
        if correct + incorrect > 0 {
            stats.accuracy = correct as f64 / (correct + incorrect) as f64 * 100.0;
        }
        stats
    }
}

// ---------------------------------------------------------------------------
// Learner overview
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelCompletion {
    pub level: String,
    pub lessons: u32,
    pub completed: u32,
}

impl LevelCompletion {
    pub fn ratio(&self) -> f64 {
        if self.lessons == 0 {
            return 0.0;
        }
        f64::from(self.completed) / f64::from(self.lessons)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserOverview {
    pub user_id: UserId,
    pub total_xp: u64,
    pub level: u32,
    pub lessons_completed: u32,
    pub lessons_in_progress: u32,
    /// Mean score over completed lessons, 0 when none.
    pub average_score: f64,
    pub attempts: u32,
    pub levels: Vec<LevelCompletion>,
    pub srs: SrsStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonReport {
    pub lesson_id: LessonId,
    pub stats: LessonStats,
    pub mistakes: Vec<MistakeCount>,
}

/// Read-only reporting over the store.
pub struct Analytics {
    services: Services,
}

impl Analytics {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    /// Attempt statistics and the most frequently missed exercises of one lesson.
    pub async fn lesson_report(&self, user: UserId, lesson: LessonId) -> Result<LessonReport> {
        let attempts = match self.services.store.progress(user, lesson).await? {
            Some(progress) => self.services.store.attempts(progress.id).await?,
            None => Vec::new(),
        };
        Ok(LessonReport {
            lesson_id: lesson,
            stats: LessonStats::from_attempts(&attempts),
            mistakes: mistake_summary(&attempts),
        })
    }

    pub async fn srs_stats(&self, user: UserId) -> Result<SrsStats> {
        let cards = self.services.store.card_directions(user).await?;
        Ok(SrsStats::compute(
            &cards,
            self.services.now(),
            self.services.config.srs.mastery_interval_days,
        ))
    }

    pub async fn user_overview(&self, user: UserId) -> Result<UserOverview> {
        let store = &self.services.store;
        let xp = store.user_xp(user).await?;
        let progress = store.user_progress(user).await?;

        let completed: Vec<&LessonProgress> =
            progress.iter().filter(|p| p.is_completed()).collect();
        let in_progress = progress
            .iter()
            .filter(|p| p.status == ProgressStatus::InProgress)
            .count() as u32;
        let average_score = if completed.is_empty() {
            0.0
        } else {
            completed.iter().map(|p| p.score).sum::<f64>() / completed.len() as f64
        };

        let attempt_lists =
            try_join_all(progress.iter().map(|p| store.attempts(p.id))).await?;
        let attempts = attempt_lists.iter().map(Vec::len).sum::<usize>() as u32;

        let completed_ids: std::collections::HashSet<i64> =
            completed.iter().map(|p| p.lesson_id).collect();
        let mut levels = Vec::new();
        for level in store.levels().await? {
            let mut row = LevelCompletion {
                level: level.code.clone(),
                lessons: 0,
                completed: 0,
            };
            for module in store.modules_in_level(&level.code).await? {
                for lesson in store.lessons_in_module(module.id).await? {
                    row.lessons += 1;
                    if completed_ids.contains(&lesson.id) {
                        row.completed += 1;
                    }
                }
            }
            levels.push(row);
        }

        Ok(UserOverview {
            user_id: user,
            total_xp: xp.total_xp,
            level: xp.level(),
            lessons_completed: completed.len() as u32,
            lessons_in_progress: in_progress,
            average_score,
            attempts,
            levels,
            srs: self.srs_stats(user).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Direction, Mistake};
    use chrono::{Duration, TimeZone};
    use serde_json::json;
    use uuid::Uuid;

    fn attempt(number: u32, score: f64, passed: bool, missed: &[&str]) -> LessonAttempt {
        LessonAttempt {
            id: Uuid::new_v4(),
            progress_id: 1,
            attempt_number: number,
            started_at: Utc::now(),
            completed_at: None,
            score,
            passed,
            correct_answers: None,
            total_questions: None,
            mistakes: missed
                .iter()
                .map(|i| Mistake {
                    index: i.to_string(),
                    user_answer: json!("x"),
                    correct_answer: json!("y"),
                })
                .collect(),
            retroactive: false,
        }
    }

    #[test]
    fn lesson_stats_from_attempts() {
        let attempts = vec![
            attempt(3, 90.0, true, &[]),
            attempt(1, 40.0, false, &["0", "2"]),
            attempt(2, 80.0, true, &["2"]),
        ];
        let stats = LessonStats::from_attempts(&attempts);
        assert_eq!(stats.attempts, 3);
        assert_eq!(stats.best_score, 90.0);
        assert_eq!(stats.last_score, 90.0);
        assert_eq!(stats.first_pass, Some(2));
        assert!((stats.average_score - 70.0).abs() < 1e-9);
        assert!((stats.pass_rate - 2.0 / 3.0).abs() < 1e-9);

        let ranked = mistake_summary(&attempts);
        assert_eq!(ranked[0], MistakeCount { index: "2".into(), count: 2 });
        assert_eq!(ranked[1].index, "0");
    }

    #[test]
    fn empty_attempts() {
        assert_eq!(LessonStats::from_attempts(&[]), LessonStats::default());
        assert!(mistake_summary(&[]).is_empty());
    }

    #[test]
    fn srs_stats_buckets() {
        let now = Utc.with_ymd_and_hms(2026, 5, 10, 12, 0, 0).unwrap();
        let fresh = UserCardDirection::new_card(1, 1, 1, 1, Direction::SourceToTarget, now);

        let mut learning = UserCardDirection::new_card(2, 1, 2, 2, Direction::SourceToTarget, now);
        learning.repetitions = 1;
        learning.interval = 3;
        learning.last_reviewed = Some(now - Duration::days(3));
        learning.next_review = now + Duration::days(1);
        learning.correct_count = 3;
        learning.incorrect_count = 1;

        let mut mature_a = UserCardDirection::new_card(3, 1, 3, 3, Direction::SourceToTarget, now);
        mature_a.repetitions = 6;
        mature_a.interval = 200;
        mature_a.last_reviewed = Some(now - Duration::days(200));
        mature_a.next_review = now;
        let mut mature_b = mature_a.clone();
        mature_b.id = 4;
        mature_b.direction = Direction::TargetToSource;
        mature_b.next_review = now + Duration::days(30);

        let stats = SrsStats::compute(&[fresh, learning, mature_a, mature_b], now, 180);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.new, 1);
        assert_eq!(stats.learning, 1);
        assert_eq!(stats.mature, 2);
        assert_eq!(stats.mastered_words, 1);
        assert_eq!(stats.due_now, 2);
        assert!((stats.accuracy - 75.0).abs() < 1e-9);
    }

    #[test]
    fn level_ratio() {
        let row = LevelCompletion {
            level: "A1".into(),
            lessons: 4,
            completed: 1,
        };
        assert_eq!(row.ratio(), 0.25);
        let empty = LevelCompletion {
            level: "C2".into(),
            lessons: 0,
            completed: 0,
        };
        assert_eq!(empty.ratio(), 0.0);
    }

    #[tokio::test]
    async fn overview_on_empty_store() {
        let services = Services::new(std::sync::Arc::new(crate::memory::MemoryStore::new()));
        let overview = Analytics::new(services).user_overview(1).await.unwrap();
        assert_eq!(overview.total_xp, 0);
        assert_eq!(overview.level, 1);
        assert_eq!(overview.lessons_completed, 0);
        assert!(overview.levels.is_empty());
        assert_eq!(overview.srs, SrsStats::default());
    }
}
