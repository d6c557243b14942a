//! Core data model types for lingua.
//!
//! Owned structures reference each other by id; the [`Store`](crate::traits::Store)
//! resolves those ids. Nothing here performs I/O.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::progress_data::ProgressData;

pub type UserId = i64;
pub type ModuleId = i64;
pub type LessonId = i64;
pub type ProgressId = i64;
pub type WordId = i64;
pub type UserWordId = i64;
pub type DirectionId = i64;

/// Initial SM-2 ease factor for a fresh card direction.
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;
/// Lower bound on the ease factor.
pub const MIN_EASE_FACTOR: f64 = 1.3;
/// Longest interval, in days, a card direction can be scheduled out.
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

// ---------------------------------------------------------------------------
// Course structure
// ---------------------------------------------------------------------------

/// A CEFR proficiency level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    /// Two-character code (e.g. "A1").
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Strict ordering among levels.
    pub position: u32,
}

/// The built-in level catalogue, pre-A1 first.
pub fn cefr_catalogue() -> Vec<Level> {
    [
        ("A0", "Starter", "Pre-A1: first words and phrases"),
        ("A1", "Beginner", "Basic everyday expressions"),
        ("A2", "Elementary", "Routine tasks and simple exchanges"),
        ("B1", "Intermediate", "Main points of familiar matters"),
        ("B2", "Upper Intermediate", "Complex text on concrete and abstract topics"),
        ("C1", "Advanced", "Demanding, longer texts and implicit meaning"),
        ("C2", "Proficient", "Virtually everything heard or read"),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, (code, name, description))| Level {
        code: code.into(),
        name: name.into(),
        description: description.into(),
        position: i as u32,
    })
    .collect()
}

/// A module within a level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    /// Code of the owning level.
    pub level: String,
    /// Unique within the level.
    pub number: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub prerequisites: Vec<Prerequisite>,
    /// Original import document, kept for provenance.
    #[serde(default)]
    pub raw_content: Option<Value>,
}

/// "Every lesson of `module_id` completed with at least `min_score`".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prerequisite {
    pub module_id: ModuleId,
    pub min_score: f64,
}

/// The kind of a lesson, selecting its content schema and grading rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonKind {
    Vocabulary,
    Grammar,
    Quiz,
    Matching,
    Text,
    Card,
    FinalTest,
}

impl LessonKind {
    pub const ALL: [LessonKind; 7] = [
        LessonKind::Vocabulary,
        LessonKind::Grammar,
        LessonKind::Quiz,
        LessonKind::Matching,
        LessonKind::Text,
        LessonKind::Card,
        LessonKind::FinalTest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LessonKind::Vocabulary => "vocabulary",
            LessonKind::Grammar => "grammar",
            LessonKind::Quiz => "quiz",
            LessonKind::Matching => "matching",
            LessonKind::Text => "text",
            LessonKind::Card => "card",
            LessonKind::FinalTest => "final_test",
        }
    }
}

impl fmt::Display for LessonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LessonKind {
    type Err = String;

    /// Accepts the canonical names plus the import synonyms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vocabulary" | "words" => Ok(LessonKind::Vocabulary),
            "grammar" => Ok(LessonKind::Grammar),
            "quiz" => Ok(LessonKind::Quiz),
            "matching" | "listening" => Ok(LessonKind::Matching),
            "text" | "reading" | "listening_immersion" => Ok(LessonKind::Text),
            "card" | "cards" | "flashcards" | "flashcard" => Ok(LessonKind::Card),
            "final_test" | "test" | "exam" => Ok(LessonKind::FinalTest),
            other => Err(format!("unknown lesson type: {other}")),
        }
    }
}

/// A lesson within a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub module_id: ModuleId,
    /// Unique within the module.
    pub number: u32,
    /// Ordering key inside the module.
    #[serde(default)]
    pub order: i32,
    pub kind: LessonKind,
    pub title: String,
    /// Raw content document; see [`crate::schema`] for the accepted shapes.
    #[serde(default)]
    pub content: Value,
    /// Card lessons only.
    #[serde(default)]
    pub min_cards_required: Option<u32>,
    /// Card lessons only, in percent.
    #[serde(default)]
    pub min_accuracy_required: Option<u32>,
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressStatus::NotStarted => write!(f, "not_started"),
            ProgressStatus::InProgress => write!(f, "in_progress"),
            ProgressStatus::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for ProgressStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "not_started" => Ok(ProgressStatus::NotStarted),
            "in_progress" => Ok(ProgressStatus::InProgress),
            "completed" => Ok(ProgressStatus::Completed),
            other => Err(format!("unknown progress status: {other}")),
        }
    }
}

/// A user's progress on one lesson. Unique per (user, lesson).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonProgress {
    pub id: ProgressId,
    pub user_id: UserId,
    pub lesson_id: LessonId,
    pub status: ProgressStatus,
    /// Two-decimal score in [0, 100].
    pub score: f64,
    /// Set once any score has been written, including a score of zero.
    #[serde(default)]
    pub graded: bool,
    pub data: ProgressData,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_items: Option<u32>,
    #[serde(default)]
    pub total_items: Option<u32>,
    #[serde(default)]
    pub reading_time: Option<u32>,
    /// Optimistic-concurrency version, bumped by the store on every write.
    #[serde(default)]
    pub version: u64,
}

impl LessonProgress {
    /// A fresh `in_progress` record, as created on first entry.
    pub fn start(
        id: ProgressId,
        user_id: UserId,
        lesson_id: LessonId,
        kind: LessonKind,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            lesson_id,
            status: ProgressStatus::InProgress,
            score: 0.0,
            graded: false,
            data: ProgressData::for_kind(kind),
            started_at: now,
            last_activity: now,
            completed_at: None,
            completed_items: None,
            total_items: None,
            reading_time: None,
            version: 0,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ProgressStatus::Completed
    }

    /// Integer percentage for display, rounding half away from zero.
    pub fn percent(&self) -> u8 {
        self.score.round().clamp(0.0, 100.0) as u8
    }
}

/// A single exercise the user got wrong in an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mistake {
    /// Exercise index within the lesson.
    pub index: String,
    pub user_answer: Value,
    pub correct_answer: Value,
}

/// An immutable record of one graded submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonAttempt {
    pub id: Uuid,
    pub progress_id: ProgressId,
    /// 1-based, monotonically increasing per progress record.
    pub attempt_number: u32,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub score: f64,
    pub passed: bool,
    #[serde(default)]
    pub correct_answers: Option<u32>,
    #[serde(default)]
    pub total_questions: Option<u32>,
    #[serde(default)]
    pub mistakes: Vec<Mistake>,
    /// Synthesised from a legacy progress record rather than a real submission.
    #[serde(default)]
    pub retroactive: bool,
}

// ---------------------------------------------------------------------------
// Words and card directions
// ---------------------------------------------------------------------------

/// A language item: an English form and its Russian gloss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub id: WordId,
    /// Unique.
    pub english: String,
    pub russian: String,
    #[serde(default)]
    pub audio: Option<String>,
    #[serde(default)]
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordStatus {
    New,
    Learning,
    Review,
}

/// A user's relationship to one word. Unique per (user, word).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserWord {
    pub id: UserWordId,
    pub user_id: UserId,
    pub word_id: WordId,
    pub status: WordStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

/// One half of a word's flash card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// English prompt, Russian answer.
    #[serde(rename = "src-tgt")]
    SourceToTarget,
    /// Russian prompt, English answer.
    #[serde(rename = "tgt-src")]
    TargetToSource,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::SourceToTarget => Direction::TargetToSource,
            Direction::TargetToSource => Direction::SourceToTarget,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::SourceToTarget => write!(f, "src-tgt"),
            Direction::TargetToSource => write!(f, "tgt-src"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "src-tgt" | "source_to_target" | "eng_rus" | "en-ru" => Ok(Direction::SourceToTarget),
            "tgt-src" | "target_to_source" | "rus_eng" | "ru-en" => Ok(Direction::TargetToSource),
            other => Err(format!("unknown card direction: {other}")),
        }
    }
}

/// SRS state for one direction of one user's word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCardDirection {
    pub id: DirectionId,
    pub user_id: UserId,
    pub user_word_id: UserWordId,
    pub word_id: WordId,
    pub direction: Direction,
    /// Successful recalls in a row.
    pub repetitions: u32,
    pub ease_factor: f64,
    /// Days.
    pub interval: u32,
    pub next_review: DateTime<Utc>,
    #[serde(default)]
    pub last_reviewed: Option<DateTime<Utc>>,
    /// "Again" ratings since the last success.
    #[serde(default)]
    pub session_attempts: u32,
    #[serde(default)]
    pub correct_count: u32,
    #[serde(default)]
    pub incorrect_count: u32,
    #[serde(default)]
    pub version: u64,
}

impl UserCardDirection {
    /// A never-reviewed direction, due immediately.
    pub fn new_card(
        id: DirectionId,
        user_id: UserId,
        user_word_id: UserWordId,
        word_id: WordId,
        direction: Direction,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            user_word_id,
            word_id,
            direction,
            repetitions: 0,
            ease_factor: DEFAULT_EASE_FACTOR,
            interval: 0,
            next_review: now,
            last_reviewed: None,
            session_attempts: 0,
            correct_count: 0,
            incorrect_count: 0,
            version: 0,
        }
    }

    pub fn is_new(&self) -> bool {
        self.repetitions == 0 && self.last_reviewed.is_none()
    }

    /// Due when `next_review` falls on or before the current UTC day.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review.date_naive() <= now.date_naive()
    }

    /// `now` plus the current interval. Fails instead of overflowing the calendar.
    pub fn schedule_after(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        now.checked_add_signed(Duration::days(i64::from(self.interval)))
            .ok_or_else(|| {
                CoreError::InvariantViolation(format!(
                    "card {} interval of {} days overflows the calendar",
                    self.id, self.interval
                ))
            })
    }
}

/// True iff the word's shortest interval across its directions reaches the
/// mastery threshold. A word with no directions is not mastered.
pub fn is_mastered<'a>(
    directions: impl IntoIterator<Item = &'a UserCardDirection>,
    threshold_days: u32,
) -> bool {
    directions
        .into_iter()
        .map(|d| d.interval)
        .min()
        .is_some_and(|min| min >= threshold_days)
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Accumulated experience for one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserXp {
    pub user_id: UserId,
    pub total_xp: u64,
}

impl UserXp {
    pub fn level(&self) -> u32 {
        level_for_xp(self.total_xp)
    }
}

/// `floor(sqrt(xp / 100)) + 1`: level 2 at 100 XP, level 3 at 400, level 4 at 900.
pub fn level_for_xp(total_xp: u64) -> u32 {
    ((total_xp as f64 / 100.0).sqrt().floor() as u32) + 1
}

/// Minimum total XP for `level`.
pub fn xp_for_level(level: u32) -> u64 {
    let n = u64::from(level.saturating_sub(1));
    n * n * 100
}

/// Per-user daily SRS limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    pub new_words_per_day: u32,
    pub reviews_per_day: u32,
}

/// Round to two decimals and clamp into [0, 100].
pub fn round_score(score: f64) -> f64 {
    if !score.is_finite() {
        return 0.0;
    }
    ((score * 100.0).round() / 100.0).clamp(0.0, 100.0)
}
