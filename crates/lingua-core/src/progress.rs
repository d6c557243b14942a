//! Progress records, attempts and XP.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::model::{
    round_score, Lesson, LessonAttempt, LessonId, LessonKind, LessonProgress, Mistake,
    ProgressStatus, UserId,
};
use crate::progress_data::ProgressData;
use crate::services::{retry_on_conflict, Services};
use crate::traits::{Sequence, Transaction};

/// Fields a caller may change on a progress record. Absent fields are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    #[serde(default)]
    pub status: Option<ProgressStatus>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub data: Option<ProgressData>,
    #[serde(default)]
    pub completed_items: Option<u32>,
    #[serde(default)]
    pub total_items: Option<u32>,
    #[serde(default)]
    pub reading_time: Option<u32>,
}

impl ProgressUpdate {
    pub fn completed(score: f64) -> Self {
        Self {
            status: Some(ProgressStatus::Completed),
            score: Some(score),
            ..Self::default()
        }
    }
}

/// Outcome of one graded submission, for the attempt log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttemptInput {
    pub score: f64,
    pub correct: Option<u32>,
    pub total: Option<u32>,
    pub mistakes: Vec<Mistake>,
}

/// Apply `update` to `progress` in place.
///
/// Status never regresses from `completed`. Returns `true` when this call
/// moved the record into `completed`.
pub fn apply_update(
    progress: &mut LessonProgress,
    update: &ProgressUpdate,
    now: DateTime<Utc>,
) -> Result<bool> {
    if update.total_items == Some(0) {
        return Err(CoreError::InvalidInput("total_items must be at least 1".into()));
    }
    let completed_items = update.completed_items.or(progress.completed_items);
    let total_items = update.total_items.or(progress.total_items);
    if let (Some(done), Some(total)) = (completed_items, total_items) {
        if done > total {
            return Err(CoreError::InvalidInput(format!(
                "completed_items ({done}) exceeds total_items ({total})"
            )));
        }
    }
    if let Some(data) = &update.data {
        if data.kind() != progress.data.kind() {
            return Err(CoreError::InvalidInput(format!(
                "{} progress data sent for a {} lesson",
                data.kind(),
                progress.data.kind()
            )));
        }
    }

    let was_completed = progress.is_completed();
    if let Some(score) = update.score {
        if !score.is_finite() {
            return Err(CoreError::InvalidInput(format!("score {score} is not a number")));
        }
        progress.score = round_score(score);
        progress.graded = true;
    }
    if let Some(data) = &update.data {
        progress.data = data.clone();
    }
    progress.completed_items = completed_items;
    progress.total_items = total_items;
    if let Some(seconds) = update.reading_time {
        progress.reading_time = Some(seconds);
        progress.data.set_reading_time(seconds);
    }
    match update.status {
        Some(ProgressStatus::Completed) => progress.status = ProgressStatus::Completed,
        Some(status) if !was_completed => progress.status = status,
        _ => {}
    }
    if progress.is_completed() && progress.completed_at.is_none() {
        progress.completed_at = Some(now);
    }
    progress.last_activity = now;

    check_invariants(progress)?;
    Ok(progress.is_completed() && !was_completed)
}

fn check_invariants(progress: &LessonProgress) -> Result<()> {
    if !(0.0..=100.0).contains(&progress.score) {
        let err = CoreError::InvariantViolation(format!(
            "progress {} score {} outside [0, 100]",
            progress.id, progress.score
        ));
        error!(error = %err, "refusing to persist progress");
        return Err(err);
    }
    if progress.is_completed() && progress.completed_at.is_none() {
        let err = CoreError::InvariantViolation(format!(
            "progress {} completed without completed_at",
            progress.id
        ));
        error!(error = %err, "refusing to persist progress");
        return Err(err);
    }
    Ok(())
}

/// Attempts to append for a new submission.
///
/// A record that carries a score but has no attempts (written before attempts
/// were logged) first gets one retroactive attempt, so numbering stays dense.
/// A stored score of zero counts once the record is marked `graded`.
pub fn attempts_to_append(
    progress: &LessonProgress,
    prior: &[LessonAttempt],
    input: &AttemptInput,
    pass_score: f64,
    now: DateTime<Utc>,
) -> Vec<LessonAttempt> {
    let mut out = Vec::with_capacity(2);
    let has_legacy_score = progress.graded || progress.score > 0.0 || progress.is_completed();
    if prior.is_empty() && progress.version > 0 && has_legacy_score {
        out.push(LessonAttempt {
            id: Uuid::new_v4(),
            progress_id: progress.id,
            attempt_number: 1,
            started_at: progress.started_at,
            completed_at: progress.completed_at.or(Some(progress.last_activity)),
            score: progress.score,
            passed: progress.score >= pass_score,
            correct_answers: None,
            total_questions: None,
            mistakes: Vec::new(),
            retroactive: true,
        });
    }
    let score = round_score(input.score);
    out.push(LessonAttempt {
        id: Uuid::new_v4(),
        progress_id: progress.id,
        attempt_number: (prior.len() + out.len()) as u32 + 1,
        started_at: now,
        completed_at: Some(now),
        score,
        passed: score >= pass_score,
        correct_answers: input.correct,
        total_questions: input.total,
        mistakes: input.mistakes.clone(),
        retroactive: false,
    });
    out
}

/// Score multiplier applied to base XP.
pub fn xp_multiplier(score: f64) -> f64 {
    if score >= 90.0 {
        2.0
    } else if score >= 80.0 {
        1.5
    } else if score >= 70.0 {
        1.0
    } else {
        0.5
    }
}

/// XP earned for a lesson with `base` XP completed at `score`, truncated.
pub fn xp_award(base: u32, score: f64) -> u64 {
    (f64::from(base) * xp_multiplier(score)).trunc() as u64
}

/// Persists progress transitions and their side effects.
#[derive(Clone)]
pub struct ProgressRecorder {
    services: Services,
}

impl ProgressRecorder {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    /// Create the record if absent, then apply `update`.
    pub async fn upsert_progress(
        &self,
        user: UserId,
        lesson_id: LessonId,
        update: ProgressUpdate,
    ) -> Result<LessonProgress> {
        let lesson = self.services.lesson(lesson_id).await?;
        let _guard = self.services.locks.lock(user, lesson_id).await;

        let (lesson_ref, update) = (&lesson, &update);
        let (progress, completed_now) = retry_on_conflict("upsert_progress", || async move {
            let now = self.services.now();
            let mut progress = self.load_or_start(user, lesson_ref, now).await?;
            let completed_now = apply_update(&mut progress, update, now)?;
            let mut tx = Transaction::new();
            tx.put_progress(progress.clone());
            self.services.store.commit(tx).await?;
            progress.version += 1;
            Ok((progress, completed_now))
        })
        .await?;

        if completed_now {
            self.on_completed(&progress, lesson.kind).await;
        }
        Ok(progress)
    }

    /// Append an attempt for `progress`, synthesising a retroactive one first
    /// when the record predates attempt logging.
    pub async fn record_attempt(
        &self,
        progress: &LessonProgress,
        input: AttemptInput,
    ) -> Result<LessonAttempt> {
        let _guard = self
            .services
            .locks
            .lock(progress.user_id, progress.lesson_id)
            .await;
        let pass_score = self.services.config.grading.attempt_pass_score;
        let input = &input;

        retry_on_conflict("record_attempt", || async move {
            let prior = self.services.store.attempts(progress.id).await?;
            let attempts =
                attempts_to_append(progress, &prior, input, pass_score, self.services.now());
            let mut tx = Transaction::new();
            for attempt in &attempts {
                tx.add_attempt(attempt.clone());
            }
            self.services.store.commit(tx).await?;
            attempts
                .last()
                .cloned()
                .ok_or_else(|| CoreError::InvariantViolation("no attempt produced".into()))
        })
        .await
    }

    /// Credit XP for completing a lesson of `kind` at `score`.
    pub async fn award_xp(&self, user: UserId, kind: LessonKind, score: f64) -> Result<u64> {
        let amount = xp_award(self.services.config.xp.base_for(kind), score);
        if amount == 0 {
            return Ok(0);
        }
        let total = self.services.store.add_xp(user, amount).await?;
        info!(user, %kind, amount, total = total.total_xp, "xp awarded");
        self.services.observer.on_xp_awarded(user, amount, &total);
        Ok(amount)
    }

    /// Side effects of a completion transition, run after the commit.
    /// Failures are logged and never surface to the caller.
    pub async fn on_completed(&self, progress: &LessonProgress, kind: LessonKind) {
        info!(
            user = progress.user_id,
            lesson = progress.lesson_id,
            score = progress.score,
            "lesson completed"
        );
        if let Err(err) = self.award_xp(progress.user_id, kind, progress.score).await {
            warn!(user = progress.user_id, error = %err, "xp award failed");
        }
        self.services.observer.on_lesson_completed(progress);
    }

    /// Existing progress for `(user, lesson)` or a fresh, unsaved record.
    pub async fn load_or_start(
        &self,
        user: UserId,
        lesson: &Lesson,
        now: DateTime<Utc>,
    ) -> Result<LessonProgress> {
        match self.services.store.progress(user, lesson.id).await? {
            Some(progress) => Ok(progress),
            None => {
                let id = self.services.store.next_id(Sequence::Progress).await?;
                Ok(LessonProgress::start(id, user, lesson.id, lesson.kind, now))
            }
        }
    }
}
