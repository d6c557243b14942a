//! Seams between the learning core and its environment.
//!
//! The core never reaches for global state. Persistence goes through
//! [`Store`], time through [`Clock`], and side notifications through
//! [`LearningObserver`].

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::error::Result;
use crate::model::{
    Direction, Lesson, LessonAttempt, LessonId, LessonProgress, Level, Module, ModuleId,
    ProgressId, UserCardDirection, UserId, UserSettings, UserWord, UserXp, Word, WordId,
};

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Id sequences handed out by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sequence {
    Module,
    Lesson,
    Progress,
    Word,
    UserWord,
    CardDirection,
}

/// A batch of writes applied all-or-nothing by [`Store::commit`].
///
/// Each record carries the `version` it was read at; a fresh record carries 0.
/// The store rejects the whole batch with `PersistenceConflict` when any stored
/// version differs, and bumps the version of every record it writes.
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    pub progress: Vec<LessonProgress>,
    pub attempts: Vec<LessonAttempt>,
    pub user_words: Vec<UserWord>,
    pub card_directions: Vec<UserCardDirection>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_progress(&mut self, progress: LessonProgress) -> &mut Self {
        self.progress.push(progress);
        self
    }

    pub fn add_attempt(&mut self, attempt: LessonAttempt) -> &mut Self {
        self.attempts.push(attempt);
        self
    }

    pub fn put_user_word(&mut self, user_word: UserWord) -> &mut Self {
        self.user_words.push(user_word);
        self
    }

    pub fn put_card_direction(&mut self, card: UserCardDirection) -> &mut Self {
        self.card_directions.push(card);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.progress.is_empty()
            && self.attempts.is_empty()
            && self.user_words.is_empty()
            && self.card_directions.is_empty()
    }
}

/// Abstract repository for everything the core reads and writes.
#[async_trait]
pub trait Store: Send + Sync {
    // Content.
    async fn levels(&self) -> Result<Vec<Level>>;
    async fn module(&self, id: ModuleId) -> Result<Option<Module>>;
    /// Modules of a level, ordered by number.
    async fn modules_in_level(&self, level: &str) -> Result<Vec<Module>>;
    async fn lesson(&self, id: LessonId) -> Result<Option<Lesson>>;
    /// Lessons of a module, ordered by `(order, number)`.
    async fn lessons_in_module(&self, module: ModuleId) -> Result<Vec<Lesson>>;

    // Progress.
    async fn progress(&self, user: UserId, lesson: LessonId) -> Result<Option<LessonProgress>>;
    async fn progress_in_module(
        &self,
        user: UserId,
        module: ModuleId,
    ) -> Result<Vec<LessonProgress>>;
    async fn user_progress(&self, user: UserId) -> Result<Vec<LessonProgress>>;
    /// Attempts of a progress record, ordered by attempt number.
    async fn attempts(&self, progress: ProgressId) -> Result<Vec<LessonAttempt>>;

    // Words and scheduling state.
    async fn word(&self, id: WordId) -> Result<Option<Word>>;
    async fn word_by_english(&self, english: &str) -> Result<Option<Word>>;
    async fn user_word(&self, user: UserId, word: WordId) -> Result<Option<UserWord>>;
    async fn card_directions(&self, user: UserId) -> Result<Vec<UserCardDirection>>;
    async fn card_direction(
        &self,
        user: UserId,
        word: WordId,
        direction: Direction,
    ) -> Result<Option<UserCardDirection>>;

    // Users.
    async fn user_settings(&self, user: UserId) -> Result<Option<UserSettings>>;
    async fn put_user_settings(&self, user: UserId, settings: UserSettings) -> Result<()>;
    async fn user_xp(&self, user: UserId) -> Result<UserXp>;
    /// Add `amount` to the user's total and return the new state.
    async fn add_xp(&self, user: UserId, amount: u64) -> Result<UserXp>;

    async fn next_id(&self, sequence: Sequence) -> Result<i64>;

    /// Apply every write in `tx` or none of them.
    async fn commit(&self, tx: Transaction) -> Result<()>;

    // Admin writes, last writer wins.
    async fn put_level(&self, level: Level) -> Result<()>;
    async fn put_module(&self, module: Module) -> Result<()>;
    async fn put_lesson(&self, lesson: Lesson) -> Result<()>;
    /// Insert or update a word keyed by its English form; returns the stored word.
    async fn put_word(&self, word: Word) -> Result<Word>;
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(at) }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Observers
// ---------------------------------------------------------------------------

/// Notified after learning events are committed. Implementations must not
/// block; they cannot fail the operation that triggered them.
pub trait LearningObserver: Send + Sync {
    fn on_lesson_completed(&self, progress: &LessonProgress);
    fn on_xp_awarded(&self, user: UserId, amount: u64, total: &UserXp);
    fn on_card_reviewed(&self, card: &UserCardDirection, quality: u8);
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl LearningObserver for NoopObserver {
    fn on_lesson_completed(&self, _: &LessonProgress) {}
    fn on_xp_awarded(&self, _: UserId, _: u64, _: &UserXp) {}
    fn on_card_reviewed(&self, _: &UserCardDirection, _: u8) {}
}
