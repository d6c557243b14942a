//! In-process [`Store`] implementation with JSON snapshots.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{CoreError, Result};
use crate::model::{
    Direction, Lesson, LessonAttempt, LessonId, LessonProgress, Level, Module, ModuleId,
    ProgressId, UserCardDirection, UserId, UserSettings, UserWord, UserXp, Word, WordId,
};
use crate::traits::{Sequence, Store, Transaction};

/// Serialised form of the whole store. Records are plain lists so an external
/// process can read scheduling state without knowing the store internals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub levels: Vec<Level>,
    #[serde(default)]
    pub modules: Vec<Module>,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
    #[serde(default)]
    pub progress: Vec<LessonProgress>,
    #[serde(default)]
    pub attempts: Vec<LessonAttempt>,
    #[serde(default)]
    pub words: Vec<Word>,
    #[serde(default)]
    pub user_words: Vec<UserWord>,
    #[serde(default)]
    pub card_directions: Vec<UserCardDirection>,
    #[serde(default)]
    pub user_settings: BTreeMap<UserId, UserSettings>,
    #[serde(default)]
    pub xp: BTreeMap<UserId, u64>,
}

#[derive(Default)]
struct State {
    levels: BTreeMap<String, Level>,
    modules: BTreeMap<ModuleId, Module>,
    lessons: BTreeMap<LessonId, Lesson>,
    progress: BTreeMap<ProgressId, LessonProgress>,
    attempts: Vec<LessonAttempt>,
    words: BTreeMap<WordId, Word>,
    user_words: BTreeMap<i64, UserWord>,
    card_directions: BTreeMap<i64, UserCardDirection>,
    user_settings: BTreeMap<UserId, UserSettings>,
    xp: BTreeMap<UserId, u64>,
    sequences: HashMap<Sequence, i64>,
}

impl State {
    fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut state = State {
            levels: snapshot
                .levels
                .into_iter()
                .map(|l| (l.code.clone(), l))
                .collect(),
            modules: snapshot.modules.into_iter().map(|m| (m.id, m)).collect(),
            lessons: snapshot.lessons.into_iter().map(|l| (l.id, l)).collect(),
            progress: snapshot.progress.into_iter().map(|p| (p.id, p)).collect(),
            attempts: snapshot.attempts,
            words: snapshot.words.into_iter().map(|w| (w.id, w)).collect(),
            user_words: snapshot.user_words.into_iter().map(|w| (w.id, w)).collect(),
            card_directions: snapshot
                .card_directions
                .into_iter()
                .map(|c| (c.id, c))
                .collect(),
            user_settings: snapshot.user_settings,
            xp: snapshot.xp,
            sequences: HashMap::new(),
        };
        state.sequences = HashMap::from([
            (Sequence::Module, max_key(&state.modules)),
            (Sequence::Lesson, max_key(&state.lessons)),
            (Sequence::Progress, max_key(&state.progress)),
            (Sequence::Word, max_key(&state.words)),
            (Sequence::UserWord, max_key(&state.user_words)),
            (Sequence::CardDirection, max_key(&state.card_directions)),
        ]);
        state
    }

    fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            levels: self.levels.values().cloned().collect(),
            modules: self.modules.values().cloned().collect(),
            lessons: self.lessons.values().cloned().collect(),
            progress: self.progress.values().cloned().collect(),
            attempts: self.attempts.clone(),
            words: self.words.values().cloned().collect(),
            user_words: self.user_words.values().cloned().collect(),
            card_directions: self.card_directions.values().cloned().collect(),
            user_settings: self.user_settings.clone(),
            xp: self.xp.clone(),
        }
    }

    fn next_id(&mut self, sequence: Sequence) -> i64 {
        let counter = self.sequences.entry(sequence).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Raise a sequence so later ids never collide with `id`.
    fn observe_id(&mut self, sequence: Sequence, id: i64) {
        let counter = self.sequences.entry(sequence).or_insert(0);
        *counter = (*counter).max(id);
    }

    fn check(&self, tx: &Transaction) -> Result<()> {
        for p in &tx.progress {
            match self.progress.get(&p.id) {
                Some(stored) => expect_version("progress", p.id, stored.version, p.version)?,
                None => {
                    let duplicate = self
                        .progress
                        .values()
                        .any(|s| s.user_id == p.user_id && s.lesson_id == p.lesson_id);
                    if duplicate || p.version != 0 {
                        return Err(CoreError::PersistenceConflict(format!(
                            "progress for user {} lesson {} was created concurrently",
                            p.user_id, p.lesson_id
                        )));
                    }
                }
            }
        }

        for a in &tx.attempts {
            let known = self.progress.contains_key(&a.progress_id)
                || tx.progress.iter().any(|p| p.id == a.progress_id);
            if !known {
                return Err(CoreError::not_found("progress", a.progress_id));
            }
            let taken = self
                .attempts
                .iter()
                .chain(tx.attempts.iter().filter(|other| !std::ptr::eq(*other, a)))
                .any(|o| o.progress_id == a.progress_id && o.attempt_number == a.attempt_number);
            if taken {
                return Err(CoreError::PersistenceConflict(format!(
                    "attempt {} of progress {} already recorded",
                    a.attempt_number, a.progress_id
                )));
            }
        }

        for w in &tx.user_words {
            match self.user_words.get(&w.id) {
                Some(stored) => expect_version("user word", w.id, stored.version, w.version)?,
                None => {
                    let duplicate = self
                        .user_words
                        .values()
                        .any(|s| s.user_id == w.user_id && s.word_id == w.word_id);
                    if duplicate || w.version != 0 {
                        return Err(CoreError::PersistenceConflict(format!(
                            "word {} for user {} was added concurrently",
                            w.word_id, w.user_id
                        )));
                    }
                }
            }
        }

        for c in &tx.card_directions {
            match self.card_directions.get(&c.id) {
                Some(stored) => {
                    expect_version("card direction", c.id, stored.version, c.version)?
                }
                None => {
                    let duplicate = self.card_directions.values().any(|s| {
                        s.user_word_id == c.user_word_id && s.direction == c.direction
                    });
                    if duplicate || c.version != 0 {
                        return Err(CoreError::PersistenceConflict(format!(
                            "{} direction of word {} was created concurrently",
                            c.direction, c.word_id
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, tx: Transaction) {
        for mut p in tx.progress {
            p.version += 1;
            self.observe_id(Sequence::Progress, p.id);
            self.progress.insert(p.id, p);
        }
        self.attempts.extend(tx.attempts);
        for mut w in tx.user_words {
            w.version += 1;
            self.observe_id(Sequence::UserWord, w.id);
            self.user_words.insert(w.id, w);
        }
        for mut c in tx.card_directions {
            c.version += 1;
            self.observe_id(Sequence::CardDirection, c.id);
            self.card_directions.insert(c.id, c);
        }
    }
}

fn max_key<V>(map: &BTreeMap<i64, V>) -> i64 {
    map.keys().next_back().copied().unwrap_or(0).max(0)
}

fn expect_version(entity: &str, id: i64, stored: u64, read: u64) -> Result<()> {
    if stored == read {
        Ok(())
    } else {
        Err(CoreError::PersistenceConflict(format!(
            "{entity} {id} changed since it was read (version {read}, now {stored})"
        )))
    }
}

/// [`Store`] backed by process memory.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            state: RwLock::new(State::from_snapshot(snapshot)),
        }
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.state.read().await.to_snapshot()
    }

    /// Load a snapshot file; a missing file yields an empty store.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read state: {}", path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse state: {}", path.display()))?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub async fn save(&self, path: &Path) -> anyhow::Result<()> {
        let snapshot = self.snapshot().await;
        let json = serde_json::to_string_pretty(&snapshot).context("failed to serialise state")?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write state: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "state saved");
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn levels(&self) -> Result<Vec<Level>> {
        let state = self.state.read().await;
        let mut levels: Vec<Level> = state.levels.values().cloned().collect();
        levels.sort_by_key(|l| l.position);
        Ok(levels)
    }

    async fn module(&self, id: ModuleId) -> Result<Option<Module>> {
        Ok(self.state.read().await.modules.get(&id).cloned())
    }

    async fn modules_in_level(&self, level: &str) -> Result<Vec<Module>> {
        let state = self.state.read().await;
        let mut modules: Vec<Module> = state
            .modules
            .values()
            .filter(|m| m.level == level)
            .cloned()
            .collect();
        modules.sort_by_key(|m| (m.number, m.id));
        Ok(modules)
    }

    async fn lesson(&self, id: LessonId) -> Result<Option<Lesson>> {
        Ok(self.state.read().await.lessons.get(&id).cloned())
    }

    async fn lessons_in_module(&self, module: ModuleId) -> Result<Vec<Lesson>> {
        let state = self.state.read().await;
        let mut lessons: Vec<Lesson> = state
            .lessons
            .values()
            .filter(|l| l.module_id == module)
            .cloned()
            .collect();
        lessons.sort_by_key(|l| (l.order, l.number, l.id));
        Ok(lessons)
    }

    async fn progress(&self, user: UserId, lesson: LessonId) -> Result<Option<LessonProgress>> {
        let state = self.state.read().await;
        Ok(state
            .progress
            .values()
            .find(|p| p.user_id == user && p.lesson_id == lesson)
            .cloned())
    }

    async fn progress_in_module(
        &self,
        user: UserId,
        module: ModuleId,
    ) -> Result<Vec<LessonProgress>> {
        let state = self.state.read().await;
        Ok(state
            .progress
            .values()
            .filter(|p| {
                p.user_id == user
                    && state
                        .lessons
                        .get(&p.lesson_id)
                        .is_some_and(|l| l.module_id == module)
            })
            .cloned()
            .collect())
    }

    async fn user_progress(&self, user: UserId) -> Result<Vec<LessonProgress>> {
        let state = self.state.read().await;
        Ok(state
            .progress
            .values()
            .filter(|p| p.user_id == user)
            .cloned()
            .collect())
    }

    async fn attempts(&self, progress: ProgressId) -> Result<Vec<LessonAttempt>> {
        let state = self.state.read().await;
        let mut attempts: Vec<LessonAttempt> = state
            .attempts
            .iter()
            .filter(|a| a.progress_id == progress)
            .cloned()
            .collect();
        attempts.sort_by_key(|a| a.attempt_number);
        Ok(attempts)
    }

    async fn word(&self, id: WordId) -> Result<Option<Word>> {
        Ok(self.state.read().await.words.get(&id).cloned())
    }

    async fn word_by_english(&self, english: &str) -> Result<Option<Word>> {
        let wanted = english.trim().to_lowercase();
        let state = self.state.read().await;
        Ok(state
            .words
            .values()
            .find(|w| w.english.trim().to_lowercase() == wanted)
            .cloned())
    }

    async fn user_word(&self, user: UserId, word: WordId) -> Result<Option<UserWord>> {
        let state = self.state.read().await;
        Ok(state
            .user_words
            .values()
            .find(|w| w.user_id == user && w.word_id == word)
            .cloned())
    }

    async fn card_directions(&self, user: UserId) -> Result<Vec<UserCardDirection>> {
        let state = self.state.read().await;
        Ok(state
            .card_directions
            .values()
            .filter(|c| c.user_id == user)
            .cloned()
            .collect())
    }

    async fn card_direction(
        &self,
        user: UserId,
        word: WordId,
        direction: Direction,
    ) -> Result<Option<UserCardDirection>> {
        let state = self.state.read().await;
        Ok(state
            .card_directions
            .values()
            .find(|c| c.user_id == user && c.word_id == word && c.direction == direction)
            .cloned())
    }

    async fn user_settings(&self, user: UserId) -> Result<Option<UserSettings>> {
        Ok(self.state.read().await.user_settings.get(&user).copied())
    }

    async fn put_user_settings(&self, user: UserId, settings: UserSettings) -> Result<()> {
        self.state
            .write()
            .await
            .user_settings
            .insert(user, settings);
        Ok(())
    }

    async fn user_xp(&self, user: UserId) -> Result<UserXp> {
        let state = self.state.read().await;
        Ok(UserXp {
            user_id: user,
            total_xp: state.xp.get(&user).copied().unwrap_or(0),
        })
    }

    async fn add_xp(&self, user: UserId, amount: u64) -> Result<UserXp> {
        let mut state = self.state.write().await;
        let total = state.xp.entry(user).or_insert(0);
        *total = total.saturating_add(amount);
        Ok(UserXp {
            user_id: user,
            total_xp: *total,
        })
    }

    async fn next_id(&self, sequence: Sequence) -> Result<i64> {
        Ok(self.state.write().await.next_id(sequence))
    }

    async fn commit(&self, tx: Transaction) -> Result<()> {
        let mut state = self.state.write().await;
        state.check(&tx)?;
        state.apply(tx);
        Ok(())
    }

    async fn put_level(&self, level: Level) -> Result<()> {
        self.state
            .write()
            .await
            .levels
            .insert(level.code.clone(), level);
        Ok(())
    }

    async fn put_module(&self, module: Module) -> Result<()> {
        let mut state = self.state.write().await;
        state.observe_id(Sequence::Module, module.id);
        state.modules.insert(module.id, module);
        Ok(())
    }

    async fn put_lesson(&self, lesson: Lesson) -> Result<()> {
        let mut state = self.state.write().await;
        state.observe_id(Sequence::Lesson, lesson.id);
        state.lessons.insert(lesson.id, lesson);
        Ok(())
    }

    async fn put_word(&self, mut word: Word) -> Result<Word> {
        let mut state = self.state.write().await;
        let wanted = word.english.trim().to_lowercase();
        let existing = state
            .words
            .values()
            .find(|w| w.english.trim().to_lowercase() == wanted)
            .map(|w| w.id);
        word.id = match existing {
            Some(id) => id,
            None if word.id > 0 && !state.words.contains_key(&word.id) => word.id,
            None => state.next_id(Sequence::Word),
        };
        state.observe_id(Sequence::Word, word.id);
        state.words.insert(word.id, word.clone());
        Ok(word)
    }
}
