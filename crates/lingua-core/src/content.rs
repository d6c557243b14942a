//! Canonical lesson content.
//!
//! [`crate::schema::validate_content`] maps every accepted input shape onto
//! these types. Downstream code reads only canonical fields. Unknown fields
//! are carried in `extra` and serialised back unchanged.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::model::{LessonKind, WordId};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LessonContent {
    Vocabulary(VocabularyContent),
    Grammar(GrammarContent),
    Quiz(QuizContent),
    Matching(MatchingContent),
    Text(TextContent),
    Card(CardContent),
    FinalTest(FinalTestContent),
}

impl LessonContent {
    pub fn kind(&self) -> LessonKind {
        match self {
            LessonContent::Vocabulary(_) => LessonKind::Vocabulary,
            LessonContent::Grammar(_) => LessonKind::Grammar,
            LessonContent::Quiz(_) => LessonKind::Quiz,
            LessonContent::Matching(_) => LessonKind::Matching,
            LessonContent::Text(_) => LessonKind::Text,
            LessonContent::Card(_) => LessonKind::Card,
            LessonContent::FinalTest(_) => LessonKind::FinalTest,
        }
    }

    /// Canonical JSON form.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Passing score declared by the content author, if any.
    pub fn declared_passing_score(&self) -> Option<f64> {
        match self {
            LessonContent::Quiz(q) => q.passing_score,
            LessonContent::FinalTest(t) => t.passing_score,
            _ => None,
        }
    }
}

/// A vocabulary entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VocabularyItem {
    pub word: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_id: Option<WordId>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VocabularyContent {
    pub words: Vec<VocabularyItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exercises: Vec<Question>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrammarContent {
    #[serde(rename = "content", skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exercises: Vec<Question>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizContent {
    pub questions: Vec<Question>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passing_score: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pair {
    pub left: String,
    pub right: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchingContent {
    pub pairs: Vec<Pair>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextContent {
    #[serde(rename = "content")]
    pub body: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<Question>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A word a card lesson introduces: a store id or an inline item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CardWord {
    Id(WordId),
    Item(VocabularyItem),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardContent {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub words: Vec<CardWord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Quiz,
    Grammar,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SectionKind,
    pub questions: Vec<Question>,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalTestContent {
    pub sections: Vec<Section>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passing_score: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One gradeable exercise.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Question {
    #[serde(rename = "question", skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(flatten)]
    pub kind: QuestionKind,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice {
        options: Vec<String>,
        /// 0-based index into `options`.
        correct: usize,
    },
    TrueFalse {
        correct: bool,
    },
    FillBlank {
        /// Canonical answer first, then alternatives.
        answers: Vec<String>,
    },
    Translation {
        answers: Vec<String>,
    },
    Reorder {
        words: Vec<String>,
        correct_answer: String,
    },
    Matching {
        pairs: Vec<Pair>,
    },
    SentenceBuilder {
        words: Vec<String>,
        correct_order: Vec<String>,
    },
    ErrorCorrection {
        sentence: String,
        answers: Vec<String>,
    },
}

impl QuestionKind {
    pub fn name(&self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice { .. } => "multiple_choice",
            QuestionKind::TrueFalse { .. } => "true_false",
            QuestionKind::FillBlank { .. } => "fill_blank",
            QuestionKind::Translation { .. } => "translation",
            QuestionKind::Reorder { .. } => "reorder",
            QuestionKind::Matching { .. } => "matching",
            QuestionKind::SentenceBuilder { .. } => "sentence_builder",
            QuestionKind::ErrorCorrection { .. } => "error_correction",
        }
    }
}

impl Question {
    pub fn new(kind: QuestionKind) -> Self {
        Self {
            prompt: None,
            explanation: None,
            kind,
            extra: Map::new(),
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// The answer shown back to the user in feedback.
    pub fn correct_answer(&self) -> Value {
        match &self.kind {
            QuestionKind::MultipleChoice { options, correct } => options
                .get(*correct)
                .map(|o| Value::String(o.clone()))
                .unwrap_or(Value::Null),
            QuestionKind::TrueFalse { correct } => Value::Bool(*correct),
            QuestionKind::FillBlank { answers }
            | QuestionKind::Translation { answers }
            | QuestionKind::ErrorCorrection { answers, .. } => answers
                .first()
                .map(|a| Value::String(a.clone()))
                .unwrap_or(Value::Null),
            QuestionKind::Reorder { correct_answer, .. } => Value::String(correct_answer.clone()),
            QuestionKind::Matching { pairs } => Value::Object(
                pairs
                    .iter()
                    .map(|p| (p.left.clone(), Value::String(p.right.clone())))
                    .collect(),
            ),
            QuestionKind::SentenceBuilder { correct_order, .. } => Value::Array(
                correct_order
                    .iter()
                    .map(|w| Value::String(w.clone()))
                    .collect(),
            ),
        }
    }
}
