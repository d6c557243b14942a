//! Lesson-level grading.
//!
//! [`grade_content`] is the pure scoring core: canonical content plus answers
//! in, score and feedback out. [`SubmissionGrader`] wraps it with access
//! checks, progress persistence, the attempt log and XP.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::access::AccessGatekeeper;
use crate::config::GradingConfig;
use crate::content::{LessonContent, Question, QuestionKind, Section, SectionKind};
use crate::error::{CoreError, Result};
use crate::evaluate::{evaluate, evaluate_pair, Feedback};
use crate::model::{LessonId, LessonKind, LessonProgress, Mistake, ProgressStatus, UserId};
use crate::progress::{apply_update, attempts_to_append, AttemptInput, ProgressRecorder, ProgressUpdate};
use crate::progress_data::{ProgressData, SectionResult};
use crate::schema::validate_lesson;
use crate::services::{retry_on_conflict, Services};
use crate::traits::Transaction;

// ---------------------------------------------------------------------------
// Answers
// ---------------------------------------------------------------------------

/// User answers keyed by exercise index.
///
/// Accepts a JSON object (`{"0": 1, "1": "four"}`) or a list, where the
/// position is the index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct Answers(BTreeMap<String, Value>);

impl TryFrom<Value> for Answers {
    type Error = String;

    fn try_from(value: Value) -> std::result::Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Answers(map.into_iter().collect())),
            Value::Array(items) => Ok(Answers(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (i.to_string(), v))
                    .collect(),
            )),
            Value::Null => Ok(Answers::default()),
            other => Err(format!("answers must be an object or a list, got {other}")),
        }
    }
}

impl FromIterator<(String, Value)> for Answers {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Answers(iter.into_iter().collect())
    }
}

impl Answers {
    pub fn from_value(value: Value) -> Result<Self> {
        Answers::try_from(value).map_err(CoreError::InvalidInput)
    }

    /// Answer for exercise `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(&index.to_string())
    }

    pub fn get_key(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Nested answers stored under `key`, if that value is an object or list.
    fn nested(&self, key: &str) -> Option<Answers> {
        match self.0.get(key) {
            Some(v @ (Value::Object(_) | Value::Array(_))) => Answers::try_from(v.clone()).ok(),
            _ => None,
        }
    }

    /// Flat answers written as `"<prefix>.<index>"`.
    fn prefixed(&self, prefix: &str) -> Answers {
        let lead = format!("{prefix}.");
        self.0
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(&lead).map(|rest| (rest.to_string(), v.clone())))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Pure grading
// ---------------------------------------------------------------------------

/// Score and feedback for one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeOutcome {
    pub score: u8,
    pub correct_count: u32,
    pub total_count: u32,
    /// Whether the submission meets the lesson's completion rule.
    pub completed: bool,
    pub feedback: BTreeMap<String, Feedback>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<SectionResult>,
}

impl GradeOutcome {
    /// Exercises answered incorrectly, for the attempt log.
    pub fn mistakes(&self) -> Vec<Mistake> {
        self.feedback
            .iter()
            .filter(|(_, f)| !f.is_correct())
            .map(|(index, f)| Mistake {
                index: index.clone(),
                user_answer: f.user_answer.clone(),
                correct_answer: f.correct_answer.clone(),
            })
            .collect()
    }
}

/// `round(100 × correct / total)`, 0 when there is nothing to grade.
pub fn percent(correct: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    (f64::from(correct) / f64::from(total) * 100.0).round() as u8
}

/// Score a threshold applies to, or `None` when any graded submission completes the lesson.
pub fn passing_threshold(content: &LessonContent, grading: &GradingConfig) -> Option<f64> {
    match content {
        LessonContent::Quiz(_) | LessonContent::FinalTest(_) => Some(
            content
                .declared_passing_score()
                .unwrap_or(grading.default_passing_score),
        ),
        LessonContent::Matching(_) => Some(grading.matching_passing_score),
        LessonContent::Grammar(_) => Some(grading.default_passing_score),
        LessonContent::Vocabulary(_) | LessonContent::Text(_) | LessonContent::Card(_) => None,
    }
}

/// Grade `answers` against canonical `content`.
pub fn grade_content(
    content: &LessonContent,
    answers: &Answers,
    grading: &GradingConfig,
) -> Result<GradeOutcome> {
    let mut tally = Tally::default();
    let mut sections = Vec::new();

    match content {
        LessonContent::Vocabulary(v) if !v.exercises.is_empty() => {
            tally.questions(&v.exercises, answers);
        }
        LessonContent::Vocabulary(v) => {
            let drills: Vec<(String, Question)> = v
                .words
                .iter()
                .filter_map(|item| {
                    let translation = item.translation.as_ref()?;
                    let mut accepted = vec![translation.clone()];
                    accepted.extend(
                        translation
                            .split([',', ';', '/'])
                            .map(str::trim)
                            .filter(|part| !part.is_empty() && *part != translation.as_str())
                            .map(str::to_string),
                    );
                    let question = Question::new(QuestionKind::Translation { answers: accepted })
                        .with_prompt(item.word.clone());
                    Some((item.word.clone(), question))
                })
                .collect();
            for (i, (word, question)) in drills.iter().enumerate() {
                let answer = answers.get(i).or_else(|| answers.get_key(word));
                tally.push(i.to_string(), evaluate(i, question, answer));
            }
        }
        LessonContent::Grammar(g) => tally.questions(&g.exercises, answers),
        LessonContent::Quiz(q) => tally.questions(&q.questions, answers),
        LessonContent::Text(t) => tally.questions(&t.questions, answers),
        LessonContent::Matching(m) => {
            for (i, pair) in m.pairs.iter().enumerate() {
                let answer = answers.get(i).or_else(|| answers.get_key(&pair.left));
                tally.push(i.to_string(), evaluate_pair(i, pair, answer));
            }
        }
        LessonContent::FinalTest(test) => {
            let mut weighted_correct = 0.0;
            let mut weighted_total = 0.0;
            for (index, section) in test.sections.iter().enumerate() {
                let section_answers = section_answers(answers, &test.sections, index);
                let mut part = Tally::default();
                part.questions(&section.questions, &section_answers);
                weighted_correct += section.weight * f64::from(part.correct);
                weighted_total += section.weight * f64::from(part.total);
                sections.push(SectionResult {
                    name: section.name.clone(),
                    score: percent(part.correct, part.total),
                    correct_count: part.correct,
                    total_count: part.total,
                    weight: section.weight,
                });
                for (key, feedback) in part.feedback {
                    tally.push(format!("{}.{key}", section.name), feedback);
                }
            }
            let score = if weighted_total > 0.0 {
                (weighted_correct / weighted_total * 100.0).round() as u8
            } else {
                0
            };
            return Ok(tally.finish(score, passing_threshold(content, grading), sections));
        }
        LessonContent::Card(_) => {
            return Err(CoreError::NotGradable {
                kind: LessonKind::Card.to_string(),
            })
        }
    }

    let score = percent(tally.correct, tally.total);
    Ok(tally.finish(score, passing_threshold(content, grading), sections))
}

/// Answers for section `index` of a final test.
///
/// Looked up, in order, under `<name>_answers`, `<name>`, `<type>_answers`
/// when no other section shares the type, and flat `<name>.<i>` or
/// `<index>.<i>` keys. A single-section test also reads the top-level map.
fn section_answers(answers: &Answers, sections: &[Section], index: usize) -> Answers {
    let section = &sections[index];
    let kind = match section.kind {
        SectionKind::Quiz => "quiz",
        SectionKind::Grammar => "grammar",
    };
    let kind_unique = sections.iter().filter(|s| s.kind == section.kind).count() == 1;

    let nested = answers
        .nested(&format!("{}_answers", section.name))
        .or_else(|| answers.nested(&section.name))
        .or_else(|| kind_unique.then(|| answers.nested(&format!("{kind}_answers"))).flatten());
    if let Some(found) = nested {
        return found;
    }
    let by_name = answers.prefixed(&section.name);
    if !by_name.is_empty() {
        return by_name;
    }
    let by_index = answers.prefixed(&index.to_string());
    if !by_index.is_empty() || sections.len() > 1 {
        return by_index;
    }
    answers.clone()
}

#[derive(Default)]
struct Tally {
    correct: u32,
    total: u32,
    feedback: BTreeMap<String, Feedback>,
}

impl Tally {
    fn questions(&mut self, questions: &[Question], answers: &Answers) {
        for (i, question) in questions.iter().enumerate() {
            let feedback = evaluate(i, question, answers.get(i));
            self.push(i.to_string(), feedback);
        }
    }

    fn push(&mut self, key: String, feedback: Feedback) {
        self.total += 1;
        if feedback.is_correct() {
            self.correct += 1;
        }
        self.feedback.insert(key, feedback);
    }

    fn finish(self, score: u8, threshold: Option<f64>, sections: Vec<SectionResult>) -> GradeOutcome {
        GradeOutcome {
            score,
            correct_count: self.correct,
            total_count: self.total,
            completed: threshold.map_or(true, |t| f64::from(score) >= t),
            feedback: self.feedback,
            sections,
        }
    }
}

// ---------------------------------------------------------------------------
// Submission grading
// ---------------------------------------------------------------------------

/// Submission result as returned to the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub score: u8,
    pub correct_count: u32,
    pub total_count: u32,
    pub completed: bool,
    pub feedback: BTreeMap<String, Feedback>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<SectionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<LessonProgress>,
}

impl GradeResponse {
    fn invalid(message: String) -> Self {
        Self {
            success: false,
            error: Some(message),
            score: 0,
            correct_count: 0,
            total_count: 0,
            completed: false,
            feedback: BTreeMap::new(),
            sections: Vec::new(),
            attempt_number: None,
            progress: None,
        }
    }
}

#[derive(Clone)]
pub struct SubmissionGrader {
    services: Services,
    recorder: ProgressRecorder,
    gate: AccessGatekeeper,
}

impl SubmissionGrader {
    pub fn new(services: Services) -> Self {
        Self {
            recorder: ProgressRecorder::new(services.clone()),
            gate: AccessGatekeeper::new(services.clone()),
            services,
        }
    }

    /// Grade a submission and persist its outcome.
    ///
    /// Invalid content yields `success: false` without touching the store.
    /// The stored score is the best seen so far and status never regresses.
    pub async fn grade(
        &self,
        lesson_id: LessonId,
        user: UserId,
        answers: Answers,
    ) -> Result<GradeResponse> {
        let lesson = self.services.lesson(lesson_id).await?;
        if lesson.kind == LessonKind::Card {
            return Err(CoreError::NotGradable {
                kind: lesson.kind.to_string(),
            });
        }
        let content = match validate_lesson(&lesson) {
            Ok(content) => content,
            Err(CoreError::ContentSchemaInvalid(message)) => {
                debug!(lesson = lesson.id, %message, "submission against invalid content");
                return Ok(GradeResponse::invalid(message));
            }
            Err(err) => return Err(err),
        };
        let outcome = grade_content(&content, &answers, &self.services.config.grading)?;

        let _guard = self.services.locks.lock(user, lesson_id).await;
        if self.services.store.progress(user, lesson_id).await?.is_none() {
            self.gate.check_entry(user, &lesson).await?;
        }

        let pass_score = self.services.config.grading.attempt_pass_score;
        let (lesson, outcome, answers) = (&lesson, &outcome, &answers);
        let (progress, attempt_number, completed_now) = retry_on_conflict("grade", || async move {
            let store = &self.services.store;
            let now = self.services.now();
            let mut progress = self.recorder.load_or_start(user, lesson, now).await?;
            let prior = if progress.version > 0 {
                store.attempts(progress.id).await?
            } else {
                Vec::new()
            };
            let attempts = attempts_to_append(
                &progress,
                &prior,
                &AttemptInput {
                    score: f64::from(outcome.score),
                    correct: Some(outcome.correct_count),
                    total: Some(outcome.total_count),
                    mistakes: outcome.mistakes(),
                },
                pass_score,
                now,
            );

            let update = ProgressUpdate {
                status: outcome.completed.then_some(ProgressStatus::Completed),
                score: Some(progress.score.max(f64::from(outcome.score))),
                data: Some(ProgressData::graded(
                    lesson.kind,
                    answers.clone(),
                    outcome.feedback.clone(),
                    outcome.sections.clone(),
                )),
                ..ProgressUpdate::default()
            };
            let completed_now = apply_update(&mut progress, &update, now)?;

            let mut tx = Transaction::new();
            tx.put_progress(progress.clone());
            for attempt in &attempts {
                tx.add_attempt(attempt.clone());
            }
            store.commit(tx).await?;
            progress.version += 1;
            let number = attempts.last().map(|a| a.attempt_number);
            Ok((progress, number, completed_now))
        })
        .await?;

        info!(
            user,
            lesson = lesson.id,
            score = outcome.score,
            correct = outcome.correct_count,
            total = outcome.total_count,
            "submission graded"
        );
        if completed_now {
            self.recorder.on_completed(&progress, lesson.kind).await;
        }

        Ok(GradeResponse {
            success: true,
            error: None,
            score: outcome.score,
            correct_count: outcome.correct_count,
            total_count: outcome.total_count,
            completed: outcome.completed,
            feedback: outcome.feedback.clone(),
            sections: outcome.sections.clone(),
            attempt_number,
            progress: Some(progress),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::model::{
        Direction, Lesson, LessonAttempt, Level, Module, ModuleId, ProgressId, UserCardDirection,
        UserSettings, UserWord, UserXp, Word, WordId,
    };
    use crate::schema::validate_content;
    use crate::traits::{Sequence, Store};
    use serde_json::json;
    use std::sync::Arc;

    fn answers(value: Value) -> Answers {
        Answers::from_value(value).unwrap()
    }

    fn grade(kind: LessonKind, content: Value, given: Value) -> GradeOutcome {
        let content = validate_content(kind, &content).unwrap();
        grade_content(&content, &answers(given), &GradingConfig::default()).unwrap()
    }

    fn arithmetic_quiz() -> Value {
        json!({ "questions": [
            { "type": "multiple_choice", "question": "2+2?", "options": ["3", "4", "5"], "correct": 1 },
            { "type": "multiple_choice", "question": "3+3?", "options": ["5", "6", "7"], "correct": 1 }
        ]})
    }

    #[test]
    fn answers_accept_lists_and_objects() {
        let from_list = answers(json!([1, "x"]));
        assert_eq!(from_list.get(1), Some(&json!("x")));
        let from_object = answers(json!({ "0": 1 }));
        assert_eq!(from_object.get(0), Some(&json!(1)));
        assert!(Answers::from_value(json!("nope")).is_err());
    }

    #[test]
    fn answers_deserialise_inside_payload() {
        let data: ProgressData =
            serde_json::from_value(json!({ "kind": "quiz", "answers": ["a", "b"] })).unwrap();
        match data {
            ProgressData::Quiz { answers, .. } => assert_eq!(answers.get(1), Some(&json!("b"))),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn quiz_score_and_counts() {
        let outcome = grade(LessonKind::Quiz, arithmetic_quiz(), json!({ "0": 1, "1": 0 }));
        assert_eq!(outcome.score, 50);
        assert_eq!((outcome.correct_count, outcome.total_count), (1, 2));
        assert!(!outcome.completed);
        assert_eq!(outcome.mistakes().len(), 1);
        assert_eq!(outcome.mistakes()[0].index, "1");
    }

    #[test]
    fn declared_passing_score_is_honoured() {
        let mut content = arithmetic_quiz();
        content["passing_score"] = json!(50);
        let outcome = grade(LessonKind::Quiz, content, json!({ "0": 1 }));
        assert_eq!(outcome.score, 50);
        assert!(outcome.completed);
    }

    #[test]
    fn matching_needs_eighty_percent() {
        let content = json!({ "pairs": [
            { "left": "a", "right": "1" }, { "left": "b", "right": "2" },
            { "left": "c", "right": "3" }, { "left": "d", "right": "4" },
            { "left": "e", "right": "5" }
        ]});
        let four = grade(LessonKind::Matching, content.clone(), json!({ "0": 0, "1": 1, "2": 2, "3": 3 }));
        assert_eq!(four.score, 80);
        assert!(four.completed);
        let three = grade(LessonKind::Matching, content, json!({ "a": "1", "b": "2", "c": "3" }));
        assert_eq!(three.score, 60);
        assert!(!three.completed);
    }

    #[test]
    fn vocabulary_without_exercises_drills_translations() {
        let content = json!({ "words": [
            { "word": "cat", "translation": "кошка, кот" },
            { "word": "dog", "translation": "собака" }
        ]});
        let outcome = grade(LessonKind::Vocabulary, content, json!({ "0": "кот", "dog": "волк" }));
        assert_eq!((outcome.correct_count, outcome.total_count), (1, 2));
        assert!(outcome.completed, "vocabulary completes on any graded submission");
    }

    #[test]
    fn grammar_without_exercises_scores_zero() {
        let outcome = grade(LessonKind::Grammar, json!({ "rule": "be" }), json!({}));
        assert_eq!(outcome.score, 0);
        assert_eq!(outcome.total_count, 0);
        assert!(!outcome.completed);
    }

    #[test]
    fn final_test_weighted_sections() {
        let content = json!({
            "sections": [
                { "name": "quiz", "type": "quiz", "weight": 2.0, "questions": [
                    { "type": "true_false", "question": "?", "correct": true },
                    { "type": "true_false", "question": "?", "correct": false }
                ]},
                { "name": "grammar", "type": "grammar", "questions": [
                    { "type": "error_correction", "sentence": "He go", "correct_answer": "He goes" }
                ]}
            ]
        });
        let outcome = grade(
            LessonKind::FinalTest,
            content,
            json!({ "quiz_answers": { "0": true, "1": true }, "grammar_answers": ["he goes"] }),
        );
        assert_eq!(outcome.sections.len(), 2);
        assert_eq!(outcome.sections[0].score, 50);
        assert_eq!(outcome.sections[1].score, 100);
        // (2·1 + 1·1) / (2·2 + 1·1) = 60%
        assert_eq!(outcome.score, 60);
        assert!(outcome.feedback.contains_key("grammar.0"));
        assert!(!outcome.completed);
    }

    #[test]
    fn single_section_test_reads_flat_answers() {
        let content = json!({ "questions": [
            { "type": "fill_blank", "question": "I ___", "answer": "am" }
        ]});
        let outcome = grade(LessonKind::FinalTest, content, json!({ "0": "am" }));
        assert_eq!(outcome.score, 100);
        assert!(outcome.completed);
    }

    #[test]
    fn card_content_is_not_gradable() {
        let content = validate_content(LessonKind::Card, &Value::Null).unwrap();
        let err = grade_content(&content, &Answers::default(), &GradingConfig::default()).unwrap_err();
        assert!(matches!(err, CoreError::NotGradable { .. }));
    }

    #[test]
    fn percent_rounds_half_away_from_zero() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(1, 8), 13);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(3, 3), 100);
    }

    async fn single_lesson_store(content: Value) -> Arc<MemoryStore> {
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
        store
            .put_lesson(Lesson {
                id: 1,
                module_id: 1,
                number: 1,
                order: 1,
                kind: LessonKind::Quiz,
                title: "Arithmetic".into(),
                content,
                min_cards_required: None,
                min_accuracy_required: None,
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn invalid_content_is_reported_without_persisting() {
        let store = single_lesson_store(json!({ "questions": [] })).await;
        let grader = SubmissionGrader::new(Services::new(store.clone()));
        let response = grader.grade(1, 1, answers(json!({}))).await.unwrap();
        assert!(!response.success);
        assert!(response.error.is_some());
        assert!(store.progress(1, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn grading_records_progress_and_attempts() {
        let store = single_lesson_store(arithmetic_quiz()).await;
        let grader = SubmissionGrader::new(Services::new(store.clone()));

        let first = grader.grade(1, 1, answers(json!({ "0": 1, "1": 1 }))).await.unwrap();
        assert!(first.success && first.completed);
        assert_eq!(first.attempt_number, Some(1));

        let second = grader.grade(1, 1, answers(json!({ "0": 0 }))).await.unwrap();
        assert_eq!(second.score, 0);
        assert_eq!(second.attempt_number, Some(2));

        let progress = store.progress(1, 1).await.unwrap().unwrap();
        assert_eq!(progress.score, 100.0);
        assert!(progress.is_completed());
        assert_eq!(store.attempts(progress.id).await.unwrap().len(), 2);
        assert_eq!(store.user_xp(1).await.unwrap().total_xp, 40);
    }

    /// Delegates to a [`MemoryStore`] but refuses every XP write.
    struct XpLedgerDown(Arc<MemoryStore>);

    #[async_trait::async_trait]
    impl Store for XpLedgerDown {
        async fn levels(&self) -> Result<Vec<Level>> {
            self.0.levels().await
        }
        async fn module(&self, id: ModuleId) -> Result<Option<Module>> {
            self.0.module(id).await
        }
        async fn modules_in_level(&self, level: &str) -> Result<Vec<Module>> {
            self.0.modules_in_level(level).await
        }
        async fn lesson(&self, id: LessonId) -> Result<Option<Lesson>> {
            self.0.lesson(id).await
        }
        async fn lessons_in_module(&self, module: ModuleId) -> Result<Vec<Lesson>> {
            self.0.lessons_in_module(module).await
        }
        async fn progress(&self, user: UserId, lesson: LessonId) -> Result<Option<LessonProgress>> {
            self.0.progress(user, lesson).await
        }
        async fn progress_in_module(
            &self,
            user: UserId,
            module: ModuleId,
        ) -> Result<Vec<LessonProgress>> {
            self.0.progress_in_module(user, module).await
        }
        async fn user_progress(&self, user: UserId) -> Result<Vec<LessonProgress>> {
            self.0.user_progress(user).await
        }
        async fn attempts(&self, progress: ProgressId) -> Result<Vec<LessonAttempt>> {
            self.0.attempts(progress).await
        }
        async fn word(&self, id: WordId) -> Result<Option<Word>> {
            self.0.word(id).await
        }
        async fn word_by_english(&self, english: &str) -> Result<Option<Word>> {
            self.0.word_by_english(english).await
        }
        async fn user_word(&self, user: UserId, word: WordId) -> Result<Option<UserWord>> {
            self.0.user_word(user, word).await
        }
        async fn card_directions(&self, user: UserId) -> Result<Vec<UserCardDirection>> {
            self.0.card_directions(user).await
        }
        async fn card_direction(
            &self,
            user: UserId,
            word: WordId,
            direction: Direction,
        ) -> Result<Option<UserCardDirection>> {
            self.0.card_direction(user, word, direction).await
        }
        async fn user_settings(&self, user: UserId) -> Result<Option<UserSettings>> {
            self.0.user_settings(user).await
        }
        async fn put_user_settings(&self, user: UserId, settings: UserSettings) -> Result<()> {
            self.0.put_user_settings(user, settings).await
        }
        async fn user_xp(&self, user: UserId) -> Result<UserXp> {
            self.0.user_xp(user).await
        }
        async fn add_xp(&self, _user: UserId, _amount: u64) -> Result<UserXp> {
            Err(CoreError::InvariantViolation("xp ledger unavailable".into()))
        }
        async fn next_id(&self, sequence: Sequence) -> Result<i64> {
            self.0.next_id(sequence).await
        }
        async fn commit(&self, tx: Transaction) -> Result<()> {
            self.0.commit(tx).await
        }
        async fn put_level(&self, level: Level) -> Result<()> {
            self.0.put_level(level).await
        }
        async fn put_module(&self, module: Module) -> Result<()> {
            self.0.put_module(module).await
        }
        async fn put_lesson(&self, lesson: Lesson) -> Result<()> {
            self.0.put_lesson(lesson).await
        }
        async fn put_word(&self, word: Word) -> Result<Word> {
            self.0.put_word(word).await
        }
    }

    #[tokio::test]
    async fn failed_xp_award_keeps_the_completed_grade() {
        let inner = single_lesson_store(arithmetic_quiz()).await;
        let store = Arc::new(XpLedgerDown(inner.clone()));
        let grader = SubmissionGrader::new(Services::new(store));

        let response = grader.grade(1, 1, answers(json!({ "0": 1, "1": 1 }))).await.unwrap();
        assert!(response.success);
        assert!(response.completed);
        assert_eq!(response.score, 100);

        let progress = inner.progress(1, 1).await.unwrap().unwrap();
        assert!(progress.is_completed());
        assert!(progress.completed_at.is_some());
        assert_eq!(inner.attempts(progress.id).await.unwrap().len(), 1);
        assert_eq!(inner.user_xp(1).await.unwrap().total_xp, 0);
    }
}
