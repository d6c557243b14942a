//! Configuration for the learning core.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::{LessonKind, UserSettings, MAX_INTERVAL_DAYS};

/// Top-level lingua configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinguaConfig {
    #[serde(default)]
    pub srs: SrsConfig,
    #[serde(default)]
    pub grading: GradingConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub xp: XpConfig,
}

/// Spaced-repetition limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SrsConfig {
    /// Default daily cap on new cards, used when a user has no settings.
    #[serde(default = "default_new_words")]
    pub new_words_per_day: u32,
    /// Default daily cap on reviews.
    #[serde(default = "default_reviews")]
    pub reviews_per_day: u32,
    /// Card lesson numbers that use the fixed per-lesson caps below.
    #[serde(default = "default_concentrated")]
    pub concentrated_lessons: Vec<u32>,
    #[serde(default = "default_concentrated_new")]
    pub concentrated_new_cap: u32,
    #[serde(default = "default_concentrated_reviews")]
    pub concentrated_review_cap: u32,
    /// Minimum interval, in days, across a word's directions to count as mastered.
    #[serde(default = "default_mastery")]
    pub mastery_interval_days: u32,
    /// Ceiling on any scheduled interval, in days.
    #[serde(default = "default_max_interval")]
    pub max_interval_days: u32,
    #[serde(default = "default_min_cards")]
    pub default_min_cards_required: u32,
    #[serde(default = "default_min_accuracy")]
    pub default_min_accuracy_required: u32,
}

fn default_new_words() -> u32 {
    10
}
fn default_reviews() -> u32 {
    50
}
fn default_concentrated() -> Vec<u32> {
    vec![3, 5]
}
fn default_concentrated_new() -> u32 {
    10
}
fn default_concentrated_reviews() -> u32 {
    20
}
fn default_mastery() -> u32 {
    180
}
fn default_max_interval() -> u32 {
    MAX_INTERVAL_DAYS
}
fn default_min_cards() -> u32 {
    10
}
fn default_min_accuracy() -> u32 {
    80
}

impl Default for SrsConfig {
    fn default() -> Self {
        Self {
            new_words_per_day: default_new_words(),
            reviews_per_day: default_reviews(),
            concentrated_lessons: default_concentrated(),
            concentrated_new_cap: default_concentrated_new(),
            concentrated_review_cap: default_concentrated_reviews(),
            mastery_interval_days: default_mastery(),
            max_interval_days: default_max_interval(),
            default_min_cards_required: default_min_cards(),
            default_min_accuracy_required: default_min_accuracy(),
        }
    }
}

impl SrsConfig {
    /// Settings applied to users who never chose their own.
    pub fn default_user_settings(&self) -> UserSettings {
        UserSettings {
            new_words_per_day: self.new_words_per_day,
            reviews_per_day: self.reviews_per_day,
        }
    }

    pub fn is_concentrated(&self, lesson_number: u32) -> bool {
        self.concentrated_lessons.contains(&lesson_number)
    }
}

/// Passing thresholds, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingConfig {
    /// Quizzes, final tests and grammar lessons without a declared threshold.
    #[serde(default = "default_passing")]
    pub default_passing_score: f64,
    #[serde(default = "default_matching_passing")]
    pub matching_passing_score: f64,
    /// Score at which an attempt counts as passed.
    #[serde(default = "default_passing")]
    pub attempt_pass_score: f64,
}

fn default_passing() -> f64 {
    70.0
}
fn default_matching_passing() -> f64 {
    80.0
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            default_passing_score: default_passing(),
            matching_passing_score: default_matching_passing(),
            attempt_pass_score: default_passing(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Share of the previous module's lessons that must be completed.
    #[serde(default = "default_unlock_ratio")]
    pub module_unlock_ratio: f64,
}

fn default_unlock_ratio() -> f64 {
    0.8
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            module_unlock_ratio: default_unlock_ratio(),
        }
    }
}

/// Base XP per lesson kind, before the score multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XpConfig {
    #[serde(default = "xp_vocabulary")]
    pub vocabulary: u32,
    #[serde(default = "xp_grammar")]
    pub grammar: u32,
    #[serde(default = "xp_quiz")]
    pub quiz: u32,
    #[serde(default = "xp_matching")]
    pub matching: u32,
    #[serde(default = "xp_text")]
    pub text: u32,
    #[serde(default = "xp_card")]
    pub card: u32,
    #[serde(default = "xp_final_test")]
    pub final_test: u32,
}

fn xp_vocabulary() -> u32 {
    10
}
fn xp_grammar() -> u32 {
    15
}
fn xp_quiz() -> u32 {
    20
}
fn xp_matching() -> u32 {
    10
}
fn xp_text() -> u32 {
    15
}
fn xp_card() -> u32 {
    25
}
fn xp_final_test() -> u32 {
    50
}

impl Default for XpConfig {
    fn default() -> Self {
        Self {
            vocabulary: xp_vocabulary(),
            grammar: xp_grammar(),
            quiz: xp_quiz(),
            matching: xp_matching(),
            text: xp_text(),
            card: xp_card(),
            final_test: xp_final_test(),
        }
    }
}

impl XpConfig {
    pub fn base_for(&self, kind: LessonKind) -> u32 {
        match kind {
            LessonKind::Vocabulary => self.vocabulary,
            LessonKind::Grammar => self.grammar,
            LessonKind::Quiz => self.quiz,
            LessonKind::Matching => self.matching,
            LessonKind::Text => self.text,
            LessonKind::Card => self.card,
            LessonKind::FinalTest => self.final_test,
        }
    }
}

impl LinguaConfig {
    /// Apply `LINGUA_*` overrides through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = lookup("LINGUA_NEW_WORDS_PER_DAY") {
            self.srs.new_words_per_day = value
                .trim()
                .parse()
                .with_context(|| format!("LINGUA_NEW_WORDS_PER_DAY is not a number: {value}"))?;
        }
        if let Some(value) = lookup("LINGUA_REVIEWS_PER_DAY") {
            self.srs.reviews_per_day = value
                .trim()
                .parse()
                .with_context(|| format!("LINGUA_REVIEWS_PER_DAY is not a number: {value}"))?;
        }
        Ok(())
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `lingua.toml` in the current directory
/// 2. `~/.config/lingua/config.toml`
///
/// Environment variable overrides: `LINGUA_NEW_WORDS_PER_DAY`, `LINGUA_REVIEWS_PER_DAY`.
pub fn load_config() -> Result<LinguaConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<LinguaConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("lingua.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|dir| dir.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<LinguaConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => LinguaConfig::default(),
    };

    config.apply_overrides(|key| std::env::var(key).ok())?;
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("lingua"))
}
